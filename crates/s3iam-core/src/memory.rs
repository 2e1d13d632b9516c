//! In-memory backend
//!
//! A [`Backend`] that keeps buckets, policies, users and access keys in process memory. It
//! behaves like an S3-compatible store with an IAM emulation: policy writes honor
//! [`WriteCondition`], a user holding access keys cannot be deleted, and access key creation
//! times come from a logical clock so that "newest key" is deterministic.

use crate::backend::{Backend, StoredPolicy, User, WriteCondition};
use crate::credential::{Credential, CredentialMetadata, SecretAccessKey};
use crate::error::CosiResult;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use time::{Duration, OffsetDateTime};

#[derive(Debug)]
struct StoredDocument {
    document: String,
    generation: u64,
}

#[derive(Debug)]
struct StoredUser {
    user: User,
    keys: Vec<CredentialMetadata>,
}

#[derive(Debug, Default)]
struct State {
    buckets: BTreeSet<String>,
    policies: BTreeMap<String, StoredDocument>,
    users: BTreeMap<String, StoredUser>,
    generation: u64,
    clock: i64,
    key_seq: u64,
    credential_limit: Option<usize>,
    unavailable: bool,
}

impl State {
    fn tick(&mut self) -> OffsetDateTime {
        self.clock += 1;
        OffsetDateTime::UNIX_EPOCH + Duration::seconds(self.clock)
    }

    fn next_generation(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    fn check_condition(&self, bucket: &str, condition: &WriteCondition) -> CosiResult {
        let current = self.policies.get(bucket).map(|d| etag(d.generation));
        match (condition, current) {
            (WriteCondition::None, _) | (WriteCondition::IfAbsent, None) => Ok(()),
            (WriteCondition::IfAbsent, Some(_)) => Err(cosi_error!(Conflict, "policy of {bucket} already exists")),
            (WriteCondition::IfMatch(expected), Some(current)) if *expected == current => Ok(()),
            (WriteCondition::IfMatch(_), _) => Err(cosi_error!(Conflict, "policy of {bucket} has changed")),
        }
    }

    fn user_mut(&mut self, name: &str) -> CosiResult<&mut StoredUser> {
        self.users
            .get_mut(name)
            .ok_or_else(|| cosi_error!(NotFound, "user {name} does not exist"))
    }
}

fn etag(generation: u64) -> String {
    format!("\"{generation}\"")
}

fn random_token() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

#[derive(Debug, Default)]
pub struct MemoryBackend {
    state: Mutex<State>,
}

impl MemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn available(&self) -> CosiResult<MutexGuard<'_, State>> {
        let state = self.lock();
        if state.unavailable {
            return Err(cosi_error!(Internal, "backend is unreachable"));
        }
        Ok(state)
    }

    /// Rejects access key creation beyond `limit` keys per user, like AWS IAM does.
    pub fn set_credential_limit(&self, limit: Option<usize>) {
        self.lock().credential_limit = limit;
    }

    /// Makes every call fail with `Internal` while `unavailable` is set.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.lock().unavailable = unavailable;
    }

    #[must_use]
    pub fn bucket_exists(&self, bucket: &str) -> bool {
        self.lock().buckets.contains(bucket)
    }

    /// The stored policy document of `bucket`.
    #[must_use]
    pub fn policy_document(&self, bucket: &str) -> Option<String> {
        self.lock().policies.get(bucket).map(|d| d.document.clone())
    }

    /// Stores a document as is, bypassing any validation.
    pub fn put_policy_document(&self, bucket: &str, document: &str) {
        let mut state = self.lock();
        let generation = state.next_generation();
        state.policies.insert(
            bucket.to_owned(),
            StoredDocument {
                document: document.to_owned(),
                generation,
            },
        );
    }

    #[must_use]
    pub fn user(&self, name: &str) -> Option<User> {
        self.lock().users.get(name).map(|u| u.user.clone())
    }

    /// Number of access keys held by the user `name`.
    #[must_use]
    pub fn credential_count(&self, name: &str) -> Option<usize> {
        self.lock().users.get(name).map(|u| u.keys.len())
    }
}

#[async_trait::async_trait]
impl Backend for MemoryBackend {
    fn supports_conditional_writes(&self) -> bool {
        true
    }

    async fn create_bucket(&self, bucket: &str) -> CosiResult<()> {
        let mut state = self.available()?;
        if !state.buckets.insert(bucket.to_owned()) {
            return Err(cosi_error!(AlreadyExists, "bucket {bucket} already exists"));
        }
        Ok(())
    }

    async fn delete_bucket(&self, bucket: &str) -> CosiResult<()> {
        let mut state = self.available()?;
        if !state.buckets.remove(bucket) {
            return Err(cosi_error!(NotFound, "bucket {bucket} does not exist"));
        }
        state.policies.remove(bucket);
        Ok(())
    }

    async fn get_policy(&self, bucket: &str) -> CosiResult<StoredPolicy> {
        let state = self.available()?;
        match state.policies.get(bucket) {
            Some(d) => Ok(StoredPolicy {
                document: d.document.clone(),
                etag: Some(etag(d.generation)),
            }),
            None => Err(cosi_error!(NotFound, "bucket {bucket} has no policy")),
        }
    }

    async fn put_policy(&self, bucket: &str, document: &str, condition: WriteCondition) -> CosiResult<()> {
        let mut state = self.available()?;
        state.check_condition(bucket, &condition)?;
        let generation = state.next_generation();
        state.policies.insert(
            bucket.to_owned(),
            StoredDocument {
                document: document.to_owned(),
                generation,
            },
        );
        Ok(())
    }

    async fn delete_policy(&self, bucket: &str, condition: WriteCondition) -> CosiResult<()> {
        let mut state = self.available()?;
        state.check_condition(bucket, &condition)?;
        match state.policies.remove(bucket) {
            Some(_) => Ok(()),
            None => Err(cosi_error!(NotFound, "bucket {bucket} has no policy")),
        }
    }

    async fn get_user(&self, name: &str) -> CosiResult<User> {
        let state = self.available()?;
        match state.users.get(name) {
            Some(u) => Ok(u.user.clone()),
            None => Err(cosi_error!(NotFound, "user {name} does not exist")),
        }
    }

    async fn create_user(&self, name: &str) -> CosiResult<User> {
        let mut state = self.available()?;
        if state.users.contains_key(name) {
            return Err(cosi_error!(AlreadyExists, "user {name} already exists"));
        }
        let id = format!("AIDA{}", random_token().to_ascii_uppercase());
        let user = User {
            name: name.to_owned(),
            arn: Some(format!("arn:aws:iam::000000000000:user/{name}")),
            created_at: Some(state.tick()),
            id,
        };
        state.users.insert(
            name.to_owned(),
            StoredUser {
                user: user.clone(),
                keys: Vec::new(),
            },
        );
        Ok(user)
    }

    async fn delete_user(&self, name: &str) -> CosiResult<()> {
        let mut state = self.available()?;
        let user = state.user_mut(name)?;
        if !user.keys.is_empty() {
            return Err(cosi_error!(Internal, "user {name} still holds access keys"));
        }
        state.users.remove(name);
        Ok(())
    }

    async fn list_credentials(&self, user_name: &str) -> CosiResult<Vec<CredentialMetadata>> {
        let mut state = self.available()?;
        Ok(state.user_mut(user_name)?.keys.clone())
    }

    async fn create_credential(&self, user_name: &str) -> CosiResult<Credential> {
        let mut state = self.available()?;
        let limit = state.credential_limit;
        if let Some(limit) = limit
            && state.user_mut(user_name)?.keys.len() >= limit
        {
            return Err(cosi_error!(Internal, "LimitExceeded: user {user_name} already holds {limit} access keys"));
        }

        state.key_seq += 1;
        let access_key_id = format!("AKIA{:016X}", state.key_seq);
        let created_at = state.tick();
        let cred = Credential {
            access_key_id,
            secret_access_key: SecretAccessKey::from(random_token()),
            created_at: Some(created_at),
        };
        state.user_mut(user_name)?.keys.push(cred.metadata());
        Ok(cred)
    }

    async fn delete_credential(&self, user_name: &str, access_key_id: &str) -> CosiResult<()> {
        let mut state = self.available()?;
        let user = state.user_mut(user_name)?;
        match user.keys.iter().position(|k| k.access_key_id == access_key_id) {
            Some(i) => {
                user.keys.remove(i);
                Ok(())
            }
            None => Err(cosi_error!(NotFound, "access key {access_key_id} does not exist")),
        }
    }
}
