//! Grant and revoke
//!
//! [`Provisioner`] is what the orchestration layer calls. It validates its input, takes one
//! configuration snapshot per call and sequences the identity and policy steps. It also creates
//! and deletes the buckets that grants refer to.

use crate::access::AccessMode;
use crate::backend::Backend;
use crate::config::{ConfigProvider, ProvisionerConfig, StaticConfigProvider};
use crate::credential::Credential;
use crate::editor::PolicyEditor;
use crate::error::CosiResult;
use crate::identity::{EnsuredCredential, IdentityManager, SecretMaterial};
use crate::naming;
use crate::validation::{check_actions, check_bucket_name, check_user_name};

use std::fmt;
use std::sync::Arc;

use s3iam_policy::ActionList;

use tracing::{error, info};

#[derive(Clone)]
pub struct Provisioner {
    backend: Arc<dyn Backend>,
    config: Arc<dyn ConfigProvider>,
}

impl fmt::Debug for Provisioner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Provisioner")
            .field("config", &self.config.snapshot())
            .finish_non_exhaustive()
    }
}

impl Provisioner {
    /// Creates a provisioner with the default configuration.
    #[must_use]
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self::with_config(backend, Arc::new(StaticConfigProvider::default()))
    }

    #[must_use]
    pub fn with_config(backend: Arc<dyn Backend>, config: Arc<dyn ConfigProvider>) -> Self {
        Self { backend, config }
    }

    #[must_use]
    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    #[must_use]
    pub fn config(&self) -> Arc<ProvisionerConfig> {
        self.config.snapshot()
    }

    /// The user name of the grant `grant_id`.
    #[must_use]
    pub fn principal_name(&self, grant_id: &str) -> String {
        naming::principal_name(&self.config.snapshot().user_name_prefix, grant_id)
    }

    /// The actions selected by an access mode annotation, or by the configured default mode
    /// when there is none.
    ///
    /// # Errors
    /// Returns `InvalidArgument` for an unknown mode.
    pub fn resolve_actions(&self, annotation: Option<&str>) -> CosiResult<ActionList> {
        let mode = AccessMode::from_annotation(annotation, self.config.snapshot().default_access_mode)?;
        Ok(mode.allowed_actions())
    }

    /// Creates `bucket` and returns its id, which is the bucket name.
    ///
    /// A bucket that already exists counts as created.
    ///
    /// # Errors
    /// + `InvalidArgument` for a malformed bucket name.
    /// + `Internal` if the backend fails.
    pub async fn create_bucket(&self, bucket: &str) -> CosiResult<String> {
        check_bucket_name(bucket)?;
        info!(bucket, "creating bucket");

        match self.backend.create_bucket(bucket).await {
            Ok(()) => info!(bucket, "created bucket"),
            Err(e) if e.is_already_exists() => info!(bucket, "bucket already exists"),
            Err(e) => {
                error!(bucket, error = %e, "failed to create bucket");
                return Err(cosi_error!(e, Internal, "failed to create bucket"));
            }
        }
        Ok(bucket.to_owned())
    }

    /// Deletes `bucket`. A bucket that does not exist counts as deleted.
    ///
    /// # Errors
    /// + `InvalidArgument` for a malformed bucket name.
    /// + `Internal` if the backend fails, for example because the bucket still holds objects.
    pub async fn delete_bucket(&self, bucket: &str) -> CosiResult<()> {
        check_bucket_name(bucket)?;
        info!(bucket, "deleting bucket");

        match self.backend.delete_bucket(bucket).await {
            Ok(()) => info!(bucket, "deleted bucket"),
            Err(e) if e.is_not_found() => info!(bucket, "bucket does not exist, nothing to delete"),
            Err(e) => {
                error!(bucket, error = %e, "failed to delete bucket");
                return Err(cosi_error!(e, Internal, "failed to delete bucket"));
            }
        }
        Ok(())
    }

    /// Grants `actions` on `bucket` to the user `principal_name` and returns a new access key for
    /// that user.
    ///
    /// The user is created if needed. Calling this again for the same bucket and user leaves the
    /// policy as it is, but mints another key.
    ///
    /// # Errors
    /// + `InvalidArgument` for a malformed bucket or user name or an empty action set.
    /// + `Internal` if the backend fails.
    pub async fn grant_access(&self, bucket: &str, principal_name: &str, actions: &ActionList) -> CosiResult<Credential> {
        match self.grant(bucket, principal_name, actions, SecretMaterial::Required).await? {
            EnsuredCredential::Issued(cred) => Ok(cred),
            EnsuredCredential::Existing(_) => Err(cosi_error!(Internal, "no secret material issued for {principal_name}")),
        }
    }

    /// Like [`grant_access`](Self::grant_access), but lets a user at the key limit reuse its
    /// newest key, which comes back without a secret.
    ///
    /// # Errors
    /// Same as [`grant_access`](Self::grant_access).
    pub async fn grant_access_with(
        &self,
        bucket: &str,
        principal_name: &str,
        actions: &ActionList,
        secret: SecretMaterial,
    ) -> CosiResult<EnsuredCredential> {
        self.grant(bucket, principal_name, actions, secret).await
    }

    async fn grant(
        &self,
        bucket: &str,
        principal_name: &str,
        actions: &ActionList,
        secret: SecretMaterial,
    ) -> CosiResult<EnsuredCredential> {
        check_bucket_name(bucket)?;
        check_user_name(principal_name)?;
        check_actions(actions)?;

        let config = self.config.snapshot();
        info!(bucket, user = principal_name, actions = %actions, "granting bucket access");

        let identities = IdentityManager::new(&*self.backend, config.max_credentials_per_user);
        let ensured = identities.ensure_principal_with(principal_name, secret).await?;

        let editor = PolicyEditor::new(&*self.backend, config.max_conflict_retries);
        let outcome = editor.add_principal(bucket, principal_name, actions).await?;

        info!(bucket, user = principal_name, ?outcome, "granted bucket access");
        Ok(ensured)
    }

    /// Removes the user `principal_name` from the policy of `bucket`, then deletes the user and
    /// all of its access keys.
    ///
    /// Revoking a grant that does not exist succeeds without changing anything.
    ///
    /// # Errors
    /// + `InvalidArgument` for a malformed bucket or user name.
    /// + `Internal` if the backend fails.
    pub async fn revoke_access(&self, bucket: &str, principal_name: &str) -> CosiResult<()> {
        check_bucket_name(bucket)?;
        check_user_name(principal_name)?;

        let config = self.config.snapshot();
        info!(bucket, user = principal_name, "revoking bucket access");

        let editor = PolicyEditor::new(&*self.backend, config.max_conflict_retries);
        let outcome = editor.remove_principal(bucket, principal_name).await?;
        info!(bucket, user = principal_name, ?outcome, "removed user from bucket policy");

        let identities = IdentityManager::new(&*self.backend, config.max_credentials_per_user);
        identities.delete_principal(principal_name).await?;

        info!(bucket, user = principal_name, "revoked bucket access");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::CosiErrorCode;
    use crate::config::HotReloadConfigProvider;
    use crate::memory::MemoryBackend;

    fn setup() -> (Arc<MemoryBackend>, Provisioner) {
        let backend = Arc::new(MemoryBackend::new());
        let provisioner = Provisioner::new(backend.clone());
        (backend, provisioner)
    }

    #[tokio::test]
    async fn invalid_arguments() {
        let (backend, p) = setup();
        let any = ActionList::Any;

        let err = p.grant_access("", "alice", &any).await.unwrap_err();
        assert_eq!(err.code(), CosiErrorCode::InvalidArgument);

        let err = p.grant_access("b1", "", &any).await.unwrap_err();
        assert_eq!(err.code(), CosiErrorCode::InvalidArgument);

        let empty = ActionList::from_iter(Vec::<String>::new());
        let err = p.grant_access("b1", "alice", &empty).await.unwrap_err();
        assert_eq!(err.code(), CosiErrorCode::InvalidArgument);

        let err = p.revoke_access("Not_A_Bucket", "alice").await.unwrap_err();
        assert_eq!(err.code(), CosiErrorCode::InvalidArgument);

        assert!(backend.user("alice").is_none());
    }

    #[tokio::test]
    async fn naming_follows_config() {
        let backend = Arc::new(MemoryBackend::new());
        let config = Arc::new(HotReloadConfigProvider::default());
        let p = Provisioner::with_config(backend, config.clone());
        assert_eq!(p.principal_name("ba-1"), "cosi-user-ba-1");

        let mut next = ProvisionerConfig::default();
        next.user_name_prefix = "tenant-".to_owned();
        next.default_access_mode = AccessMode::ListOnly;
        config.update(Arc::new(next));

        assert_eq!(p.principal_name("ba-1"), "tenant-ba-1");
        let actions = p.resolve_actions(None).unwrap();
        assert_eq!(actions, AccessMode::ListOnly.allowed_actions());
    }

    #[tokio::test]
    async fn resolve_actions_rejects_unknown_mode() {
        let (_, p) = setup();
        assert_eq!(p.resolve_actions(Some("rw")).unwrap(), AccessMode::ReadWrite.allowed_actions());
        let err = p.resolve_actions(Some("everything")).unwrap_err();
        assert_eq!(err.code(), CosiErrorCode::InvalidArgument);
    }

    #[tokio::test]
    async fn grant_with_optional_secret() {
        let (backend, p) = setup();
        let any = ActionList::Any;

        p.grant_access("b1", "alice", &any).await.unwrap();
        p.grant_access("b1", "alice", &any).await.unwrap();

        let ensured = p.grant_access_with("b1", "alice", &any, SecretMaterial::Optional).await.unwrap();
        assert!(matches!(ensured, EnsuredCredential::Existing(_)));
        assert_eq!(backend.credential_count("alice"), Some(2));
    }

    #[tokio::test]
    async fn bucket_create_and_delete_are_idempotent() {
        let (backend, p) = setup();

        assert_eq!(p.create_bucket("b1").await.unwrap(), "b1");
        assert_eq!(p.create_bucket("b1").await.unwrap(), "b1");
        assert!(backend.bucket_exists("b1"));

        p.delete_bucket("b1").await.unwrap();
        p.delete_bucket("b1").await.unwrap();
        assert!(!backend.bucket_exists("b1"));

        let err = p.create_bucket("Bad_Bucket").await.unwrap_err();
        assert_eq!(err.code(), CosiErrorCode::InvalidArgument);

        backend.set_unavailable(true);
        let err = p.create_bucket("b2").await.unwrap_err();
        assert_eq!(err.code(), CosiErrorCode::Internal);
        let err = p.delete_bucket("b2").await.unwrap_err();
        assert_eq!(err.code(), CosiErrorCode::Internal);
    }

    #[tokio::test]
    async fn grant_fails_when_backend_is_down() {
        let (backend, p) = setup();
        backend.set_unavailable(true);

        let err = p.grant_access("b1", "alice", &ActionList::Any).await.unwrap_err();
        assert_eq!(err.code(), CosiErrorCode::Internal);
        let err = p.revoke_access("b1", "alice").await.unwrap_err();
        assert_eq!(err.code(), CosiErrorCode::Internal);
    }
}
