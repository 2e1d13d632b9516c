//! Backend gateway
//!
//! The capability surface the engine needs from the object store and its identity service.
//! The engine only ever talks to a [`Backend`], never to a concrete network client, so it can be
//! driven by [`MemoryBackend`](crate::memory::MemoryBackend) in tests and by an SDK-backed
//! implementation in production.
//!
//! # Error contract
//!
//! Implementations report absence with [`CosiErrorCode::NotFound`](crate::CosiErrorCode::NotFound),
//! a duplicate bucket or user with [`CosiErrorCode::AlreadyExists`](crate::CosiErrorCode::AlreadyExists),
//! a failed [`WriteCondition`] with [`CosiErrorCode::Conflict`](crate::CosiErrorCode::Conflict),
//! and everything else (transport, authentication, throttling) with
//! [`CosiErrorCode::Internal`](crate::CosiErrorCode::Internal).

use crate::credential::{Credential, CredentialMetadata};
use crate::error::CosiResult;

use time::OffsetDateTime;

/// An identity registered with the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    /// Caller-chosen name.
    pub name: String,
    /// Backend-assigned id. Policy documents reference users by this value.
    pub id: String,
    pub arn: Option<String>,
    pub created_at: Option<OffsetDateTime>,
}

/// A policy document as stored by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredPolicy {
    /// Raw JSON text.
    pub document: String,
    /// Entity tag of this revision, if the backend tracks one.
    pub etag: Option<String>,
}

/// Precondition attached to a policy write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteCondition {
    /// Write unconditionally.
    None,
    /// Write only if the stored revision still has this entity tag.
    IfMatch(String),
    /// Write only if no document is stored.
    IfAbsent,
}

#[async_trait::async_trait]
pub trait Backend: Send + Sync + 'static {
    /// Whether writes honor [`WriteCondition`].
    ///
    /// Backends that return `false` are written unconditionally and concurrent edits of one
    /// bucket's document can overwrite each other.
    fn supports_conditional_writes(&self) -> bool {
        false
    }

    /// Creates `bucket`. A bucket that already exists is reported as `AlreadyExists`.
    async fn create_bucket(&self, bucket: &str) -> CosiResult<()>;

    /// Deletes an empty `bucket` together with its policy document.
    async fn delete_bucket(&self, bucket: &str) -> CosiResult<()>;

    /// Fetches the policy document of `bucket`.
    async fn get_policy(&self, bucket: &str) -> CosiResult<StoredPolicy>;

    /// Replaces the policy document of `bucket` as a whole.
    async fn put_policy(&self, bucket: &str, document: &str, condition: WriteCondition) -> CosiResult<()>;

    /// Removes the policy document of `bucket`.
    async fn delete_policy(&self, bucket: &str, condition: WriteCondition) -> CosiResult<()>;

    async fn get_user(&self, name: &str) -> CosiResult<User>;

    async fn create_user(&self, name: &str) -> CosiResult<User>;

    /// Deletes a user that holds no access keys.
    ///
    /// An absent user may be reported as `NotFound`; callers treat that as success.
    async fn delete_user(&self, name: &str) -> CosiResult<()>;

    async fn list_credentials(&self, user_name: &str) -> CosiResult<Vec<CredentialMetadata>>;

    async fn create_credential(&self, user_name: &str) -> CosiResult<Credential>;

    async fn delete_credential(&self, user_name: &str, access_key_id: &str) -> CosiResult<()>;
}
