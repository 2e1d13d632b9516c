//! Bucket access provisioning
//!
//! `s3iam-core` grants and revokes access to buckets of an S3-compatible object store by
//! editing the bucket's policy document and managing the IAM user that the policy names.
//!
//! A grant makes sure the user exists, mints an access key for it, and appends an `Allow`
//! statement naming the user to the bucket policy. A revoke drops the user from the bucket
//! policy (deleting the policy once it is empty), then deletes the user's keys and the user.
//! Both are idempotent and safe to retry.
//!
//! # Architecture
//!
//! - [`backend::Backend`]: the capability surface of the object store and its identity service.
//! - [`identity::IdentityManager`]: user and access key lifecycle.
//! - [`editor::PolicyEditor`]: fetch, transform and write back a bucket policy.
//! - [`provisioner::Provisioner`]: the `grant_access` / `revoke_access` facade.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use s3iam_core::memory::MemoryBackend;
//! use s3iam_core::provisioner::Provisioner;
//! use s3iam_policy::ActionList;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> s3iam_core::CosiResult {
//! let backend = Arc::new(MemoryBackend::new());
//! let provisioner = Provisioner::new(backend.clone());
//!
//! let actions = ActionList::from_iter(["s3:GetObject"]);
//! let cred = provisioner.grant_access("b1", "alice", &actions).await?;
//! assert!(!cred.secret_access_key.expose().is_empty());
//! assert!(backend.policy_document("b1").is_some());
//!
//! provisioner.revoke_access("b1", "alice").await?;
//! assert!(backend.policy_document("b1").is_none());
//! # Ok(())
//! # }
//! ```
//!
//! # Concurrency
//!
//! The engine holds no state between calls. Two edits of the same bucket's policy running at
//! the same time can overwrite each other (lost update) unless the backend supports conditional
//! writes. Callers that cannot rule this out must serialize grants and revokes per bucket, for
//! example with a single-writer queue keyed by bucket name.
//!
//! A grant or revoke that is cancelled half way has an unknown remote outcome. It leaves no
//! local state behind and can be retried.

#![allow(
    clippy::module_name_repetitions,
    clippy::multiple_crate_versions, // Sometimes not fixable
    clippy::single_match_else,
)]

#[macro_use]
mod error;

pub mod access;
pub mod backend;
pub mod config;
pub mod credential;
pub mod editor;
pub mod identity;
pub mod memory;
pub mod naming;
pub mod provisioner;
pub mod validation;

pub use self::error::*;
