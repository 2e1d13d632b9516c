//! Identity lifecycle
//!
//! Makes a named user exist exactly once and hands out usable access keys for it, and tears the
//! user down again on revoke.
//!
//! # Key limit
//!
//! The backend lets a user hold a bounded number of access keys (two on AWS and most emulations)
//! and never returns a secret again after the call that created it. A grant must return a
//! secret, so [`IdentityManager::ensure_principal`] mints a new key even when the user is already
//! at the limit. The user then holds one key more than the limit until the surplus is cleaned up
//! out of band, and backends that enforce the limit reject the call. Callers that can live
//! without secret material use [`IdentityManager::ensure_principal_with`] and
//! [`SecretMaterial::Optional`] instead, which reuses the newest existing key.

use crate::backend::{Backend, User};
use crate::credential::{Credential, CredentialMetadata, newest};
use crate::error::CosiResult;

use tracing::{debug, error, info, warn};

/// Whether the caller needs the secret of the key it gets back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretMaterial {
    /// Always mint a key, even past the key limit.
    Required,
    /// At the key limit, return the newest existing key without its secret.
    Optional,
}

/// Outcome of [`IdentityManager::ensure_principal_with`].
#[derive(Debug, Clone)]
pub enum EnsuredCredential {
    /// A newly minted key with its secret.
    Issued(Credential),
    /// An existing key. Its secret cannot be recovered.
    Existing(CredentialMetadata),
}

pub struct IdentityManager<'a> {
    backend: &'a dyn Backend,
    max_credentials: usize,
}

impl<'a> IdentityManager<'a> {
    #[must_use]
    pub fn new(backend: &'a dyn Backend, max_credentials: usize) -> Self {
        Self {
            backend,
            max_credentials,
        }
    }

    /// Looks up a user. Absence is `Ok(None)`.
    ///
    /// # Errors
    /// Returns any backend failure other than `NotFound`.
    pub async fn lookup(&self, name: &str) -> CosiResult<Option<User>> {
        lookup_user(self.backend, name).await
    }

    /// Resolves a user name to the id that policy documents reference.
    ///
    /// # Errors
    /// Returns `NotFound` if the user does not exist.
    pub async fn resolve_id(&self, name: &str) -> CosiResult<String> {
        match self.lookup(name).await? {
            Some(user) => Ok(user.id),
            None => Err(cosi_error!(NotFound, "user {name} does not exist")),
        }
    }

    /// Makes sure the user exists and returns a newly minted key for it.
    ///
    /// # Errors
    /// Returns `Internal` if the backend fails.
    pub async fn ensure_principal(&self, name: &str) -> CosiResult<Credential> {
        match self.ensure_principal_with(name, SecretMaterial::Required).await? {
            EnsuredCredential::Issued(cred) => Ok(cred),
            EnsuredCredential::Existing(_) => Err(cosi_error!(Internal, "no secret material issued for {name}")),
        }
    }

    /// Makes sure the user exists and returns a key for it.
    ///
    /// 1. An absent user is created together with its first key.
    /// 2. A user below the key limit gets one more key.
    /// 3. A user at the limit gets one more key if `secret` is [`SecretMaterial::Required`],
    ///    otherwise its newest key is returned without a secret.
    ///
    /// A user created concurrently by someone else is handled like an existing one.
    ///
    /// # Errors
    /// Returns `Internal` if the backend fails.
    pub async fn ensure_principal_with(&self, name: &str, secret: SecretMaterial) -> CosiResult<EnsuredCredential> {
        info!(user = name, "checking if user exists");

        let created = match self.lookup(name).await {
            Ok(Some(_)) => false,
            Ok(None) => {
                info!(user = name, "user does not exist, creating");
                match self.backend.create_user(name).await {
                    Ok(user) => {
                        info!(user = name, user_id = %user.id, "created user");
                        true
                    }
                    Err(e) if e.is_already_exists() => {
                        info!(user = name, "user was created concurrently");
                        false
                    }
                    Err(e) => {
                        error!(user = name, error = %e, "failed to create user");
                        return Err(internal(e, "failed to create user"));
                    }
                }
            }
            Err(e) => {
                error!(user = name, error = %e, "failed to look up user");
                return Err(internal(e, "failed to look up user"));
            }
        };

        if !created {
            let keys = self.backend.list_credentials(name).await.map_err(|e| {
                error!(user = name, error = %e, "failed to list access keys");
                internal(e, "failed to list access keys")
            })?;

            if keys.len() < self.max_credentials {
                info!(user = name, existing_keys = keys.len(), "user is below the key limit, creating key");
            } else {
                let latest = newest(&keys);
                match (secret, latest) {
                    (SecretMaterial::Optional, Some(latest)) => {
                        info!(user = name, key_id = %latest.access_key_id, "reusing newest access key");
                        return Ok(EnsuredCredential::Existing(latest.clone()));
                    }
                    (_, latest) => {
                        warn!(
                            user = name,
                            existing_keys = keys.len(),
                            newest_key_id = latest.map(|k| k.access_key_id.as_str()),
                            "user is at the key limit, creating key for its secret"
                        );
                    }
                }
            }
        }

        let cred = self.backend.create_credential(name).await.map_err(|e| {
            error!(user = name, error = %e, "failed to create access key");
            internal(e, "failed to create access key")
        })?;
        debug!(user = name, key_id = %cred.access_key_id, "created access key");

        Ok(EnsuredCredential::Issued(cred))
    }

    /// Deletes the user and all of its keys. An absent user is not an error.
    ///
    /// # Errors
    /// Returns `Internal` if the backend fails.
    pub async fn delete_principal(&self, name: &str) -> CosiResult<()> {
        info!(user = name, "attempting to delete user");

        if self.lookup(name).await.map_err(|e| internal(e, "failed to look up user"))?.is_none() {
            info!(user = name, "user does not exist, nothing to delete");
            return Ok(());
        }

        let keys = match self.backend.list_credentials(name).await {
            Ok(keys) => keys,
            Err(e) if e.is_not_found() => {
                info!(user = name, "user already deleted");
                return Ok(());
            }
            Err(e) => {
                error!(user = name, error = %e, "failed to list access keys");
                return Err(internal(e, "failed to list access keys"));
            }
        };

        for key in &keys {
            match self.backend.delete_credential(name, &key.access_key_id).await {
                Ok(()) => debug!(user = name, key_id = %key.access_key_id, "deleted access key"),
                Err(e) if e.is_not_found() => {}
                Err(e) => {
                    error!(user = name, key_id = %key.access_key_id, error = %e, "failed to delete access key");
                    return Err(internal(e, "failed to delete access key"));
                }
            }
        }

        match self.backend.delete_user(name).await {
            Ok(()) => info!(user = name, "deleted user"),
            Err(e) if e.is_not_found() => info!(user = name, "user already deleted"),
            Err(e) => {
                error!(user = name, error = %e, "failed to delete user");
                return Err(internal(e, "failed to delete user"));
            }
        }
        Ok(())
    }
}

pub(crate) async fn lookup_user(backend: &dyn Backend, name: &str) -> CosiResult<Option<User>> {
    match backend.get_user(name).await {
        Ok(user) => Ok(Some(user)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}

fn internal(err: crate::CosiError, msg: &'static str) -> crate::CosiError {
    cosi_error!(err, Internal, "{msg}")
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::CosiErrorCode;
    use crate::memory::MemoryBackend;

    #[tokio::test]
    async fn creates_user_and_first_key() {
        let backend = MemoryBackend::new();
        let im = IdentityManager::new(&backend, 2);

        let cred = im.ensure_principal("alice").await.unwrap();
        assert!(!cred.secret_access_key.expose().is_empty());
        assert_eq!(backend.credential_count("alice"), Some(1));
    }

    #[tokio::test]
    async fn key_limit_still_issues_secret() {
        let backend = MemoryBackend::new();
        let im = IdentityManager::new(&backend, 2);

        let first = im.ensure_principal("alice").await.unwrap();
        let second = im.ensure_principal("alice").await.unwrap();
        assert_eq!(backend.credential_count("alice"), Some(2));
        assert_ne!(first.access_key_id, second.access_key_id);

        let third = im.ensure_principal("alice").await.unwrap();
        assert!(!third.secret_access_key.expose().is_empty());
        assert_eq!(backend.credential_count("alice"), Some(3));
    }

    #[tokio::test]
    async fn key_limit_optional_secret_reuses_newest() {
        let backend = MemoryBackend::new();
        let im = IdentityManager::new(&backend, 2);

        im.ensure_principal("alice").await.unwrap();
        let second = im.ensure_principal("alice").await.unwrap();

        let ensured = im.ensure_principal_with("alice", SecretMaterial::Optional).await.unwrap();
        match ensured {
            EnsuredCredential::Existing(meta) => assert_eq!(meta.access_key_id, second.access_key_id),
            EnsuredCredential::Issued(_) => panic!("expected the existing key"),
        }
        assert_eq!(backend.credential_count("alice"), Some(2));
    }

    #[tokio::test]
    async fn enforcing_backend_rejects_extra_key() {
        let backend = MemoryBackend::new();
        backend.set_credential_limit(Some(2));
        let im = IdentityManager::new(&backend, 2);

        im.ensure_principal("alice").await.unwrap();
        im.ensure_principal("alice").await.unwrap();
        let err = im.ensure_principal("alice").await.unwrap_err();
        assert_eq!(err.code(), CosiErrorCode::Internal);
    }

    #[tokio::test]
    async fn delete_clears_keys_first() {
        let backend = MemoryBackend::new();
        let im = IdentityManager::new(&backend, 2);

        im.ensure_principal("alice").await.unwrap();
        im.ensure_principal("alice").await.unwrap();
        im.delete_principal("alice").await.unwrap();

        assert!(backend.user("alice").is_none());
        assert!(im.lookup("alice").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_absent_user() {
        let backend = MemoryBackend::new();
        let im = IdentityManager::new(&backend, 2);
        im.delete_principal("nobody").await.unwrap();
    }

    /// Reports every user as present, while the users themselves are gone.
    struct StaleUsers(MemoryBackend);

    #[async_trait::async_trait]
    impl Backend for StaleUsers {
        async fn create_bucket(&self, bucket: &str) -> CosiResult<()> {
            self.0.create_bucket(bucket).await
        }

        async fn delete_bucket(&self, bucket: &str) -> CosiResult<()> {
            self.0.delete_bucket(bucket).await
        }

        async fn get_policy(&self, bucket: &str) -> CosiResult<crate::backend::StoredPolicy> {
            self.0.get_policy(bucket).await
        }

        async fn put_policy(&self, bucket: &str, document: &str, condition: crate::backend::WriteCondition) -> CosiResult<()> {
            self.0.put_policy(bucket, document, condition).await
        }

        async fn delete_policy(&self, bucket: &str, condition: crate::backend::WriteCondition) -> CosiResult<()> {
            self.0.delete_policy(bucket, condition).await
        }

        async fn get_user(&self, name: &str) -> CosiResult<User> {
            Ok(User {
                name: name.to_owned(),
                id: "AIDAGONE".to_owned(),
                arn: None,
                created_at: None,
            })
        }

        async fn create_user(&self, name: &str) -> CosiResult<User> {
            self.0.create_user(name).await
        }

        async fn delete_user(&self, name: &str) -> CosiResult<()> {
            self.0.delete_user(name).await
        }

        async fn list_credentials(&self, user_name: &str) -> CosiResult<Vec<CredentialMetadata>> {
            self.0.list_credentials(user_name).await
        }

        async fn create_credential(&self, user_name: &str) -> CosiResult<Credential> {
            self.0.create_credential(user_name).await
        }

        async fn delete_credential(&self, user_name: &str, access_key_id: &str) -> CosiResult<()> {
            self.0.delete_credential(user_name, access_key_id).await
        }
    }

    #[tokio::test]
    async fn delete_user_removed_concurrently() {
        let backend = StaleUsers(MemoryBackend::new());
        let im = IdentityManager::new(&backend, 2);
        im.delete_principal("alice").await.unwrap();
    }

    #[tokio::test]
    async fn resolve_absent_user() {
        let backend = MemoryBackend::new();
        let im = IdentityManager::new(&backend, 2);
        let err = im.resolve_id("nobody").await.unwrap_err();
        assert_eq!(err.code(), CosiErrorCode::NotFound);
    }

    #[tokio::test]
    async fn unreachable_backend() {
        let backend = MemoryBackend::new();
        backend.set_unavailable(true);
        let im = IdentityManager::new(&backend, 2);

        let err = im.ensure_principal("alice").await.unwrap_err();
        assert_eq!(err.code(), CosiErrorCode::Internal);
        let err = im.delete_principal("alice").await.unwrap_err();
        assert_eq!(err.code(), CosiErrorCode::Internal);
    }
}
