use crate::params::BackendParams;

use s3iam_core::backend::{Backend, StoredPolicy, User, WriteCondition};
use s3iam_core::credential::{Credential, CredentialMetadata, SecretAccessKey};
use s3iam_core::{CosiError, CosiResult, cosi_error};

use std::time::Duration;

use aws_credential_types::Credentials;
use aws_smithy_http_client::tls::{self, TlsContext, TrustStore};
use aws_smithy_runtime_api::client::http::SharedHttpClient;
use aws_smithy_types::error::display::DisplayErrorContext;
use aws_smithy_types::error::metadata::ProvideErrorMetadata;
use aws_smithy_types::retry::RetryConfig;
use aws_smithy_types::timeout::TimeoutConfig;
use time::OffsetDateTime;
use tracing::{debug, error};

const OPERATION_TIMEOUT: Duration = Duration::from_secs(15);
const MAX_ATTEMPTS: u32 = 5;

/// A [`Backend`] talking to an S3 endpoint and its IAM service.
///
/// S3 bucket policy calls have no preconditions, so policy writes are unconditional.
#[derive(Debug, Clone)]
pub struct AwsBackend {
    s3: aws_sdk_s3::Client,
    iam: aws_sdk_iam::Client,
}

impl AwsBackend {
    /// Builds both clients from the connection parameters.
    ///
    /// Requests use path-style addressing, a 15 second operation timeout and up to 5 attempts.
    /// A CA certificate in the parameters replaces the platform trust store.
    ///
    /// # Errors
    /// Returns `InvalidArgument` if the CA certificate cannot be loaded.
    pub fn new(params: &BackendParams) -> CosiResult<Self> {
        let credentials = Credentials::new(
            params.access_key.clone(),
            params.secret_key.expose(),
            None,
            None,
            "s3iam-account-secret",
        );
        let retry = RetryConfig::standard().with_max_attempts(MAX_ATTEMPTS);
        let timeout = TimeoutConfig::builder().operation_timeout(OPERATION_TIMEOUT).build();

        let http_client = if params.tls_cert.is_empty() {
            None
        } else {
            debug!("trusting the CA certificate of the account secret");
            Some(http_client(&params.tls_cert)?)
        };

        let s3 = {
            let mut conf = aws_sdk_s3::config::Builder::new()
                .behavior_version(aws_sdk_s3::config::BehaviorVersion::latest())
                .region(aws_sdk_s3::config::Region::new(params.region.clone()))
                .credentials_provider(credentials.clone())
                .endpoint_url(params.full_endpoint())
                .force_path_style(true)
                .retry_config(retry.clone())
                .timeout_config(timeout.clone());
            conf.set_http_client(http_client.clone());
            aws_sdk_s3::Client::from_conf(conf.build())
        };

        let iam = {
            let mut conf = aws_sdk_iam::config::Builder::new()
                .behavior_version(aws_sdk_iam::config::BehaviorVersion::latest())
                .region(aws_sdk_iam::config::Region::new(params.region.clone()))
                .credentials_provider(credentials)
                .endpoint_url(params.full_iam_endpoint())
                .retry_config(retry)
                .timeout_config(timeout);
            conf.set_http_client(http_client);
            aws_sdk_iam::Client::from_conf(conf.build())
        };

        Ok(Self { s3, iam })
    }

    #[must_use]
    pub fn from_clients(s3: aws_sdk_s3::Client, iam: aws_sdk_iam::Client) -> Self {
        Self { s3, iam }
    }
}

/// An HTTPS client trusting only the CA certificates in `pem`.
fn http_client(pem: &[u8]) -> CosiResult<SharedHttpClient> {
    let trust_store = TrustStore::empty().with_pem_certificate(pem.to_vec());
    let tls_context = TlsContext::builder()
        .with_trust_store(trust_store)
        .build()
        .map_err(|e| cosi_error!(e, InvalidArgument, "invalid TLS certificate"))?;
    let client = aws_smithy_http_client::Builder::new()
        .tls_provider(tls::Provider::Rustls(tls::rustls_provider::CryptoMode::AwsLc))
        .tls_context(tls_context)
        .build_https();
    Ok(client)
}

/// Maps an SDK error to the engine's error classes by its service error code.
pub(crate) fn classify<E>(err: E, op: &'static str) -> CosiError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    let code = err.code().unwrap_or_default().to_owned();
    match code.as_str() {
        "NoSuchBucket" | "NoSuchBucketPolicy" | "NoSuchEntity" => cosi_error!(err, NotFound, "{op}: {code}"),
        "BucketAlreadyExists" | "BucketAlreadyOwnedByYou" | "EntityAlreadyExists" => {
            cosi_error!(err, AlreadyExists, "{op}: {code}")
        }
        _ => {
            error!(op, error = %DisplayErrorContext(&err), "backend call failed");
            cosi_error!(err, Internal, "{op} failed")
        }
    }
}

fn to_offset(dt: &aws_smithy_types::DateTime) -> Option<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp(dt.secs()).ok()
}

fn to_user(user: &aws_sdk_iam::types::User) -> User {
    User {
        name: user.user_name().to_owned(),
        id: user.user_id().to_owned(),
        arn: Some(user.arn().to_owned()),
        created_at: to_offset(user.create_date()),
    }
}

#[async_trait::async_trait]
impl Backend for AwsBackend {
    async fn create_bucket(&self, bucket: &str) -> CosiResult<()> {
        self.s3
            .create_bucket()
            .bucket(bucket)
            .send()
            .await
            .map_err(|e| classify(e, "CreateBucket"))?;
        Ok(())
    }

    async fn delete_bucket(&self, bucket: &str) -> CosiResult<()> {
        self.s3
            .delete_bucket()
            .bucket(bucket)
            .send()
            .await
            .map_err(|e| classify(e, "DeleteBucket"))?;
        Ok(())
    }

    async fn get_policy(&self, bucket: &str) -> CosiResult<StoredPolicy> {
        let output = self
            .s3
            .get_bucket_policy()
            .bucket(bucket)
            .send()
            .await
            .map_err(|e| classify(e, "GetBucketPolicy"))?;

        match output.policy() {
            Some(document) if !document.is_empty() => Ok(StoredPolicy {
                document: document.to_owned(),
                etag: None,
            }),
            _ => Err(cosi_error!(NotFound, "bucket {bucket} has no policy")),
        }
    }

    async fn put_policy(&self, bucket: &str, document: &str, condition: WriteCondition) -> CosiResult<()> {
        if condition != WriteCondition::None {
            debug!(bucket, ?condition, "write condition is not supported, writing unconditionally");
        }
        self.s3
            .put_bucket_policy()
            .bucket(bucket)
            .policy(document)
            .send()
            .await
            .map_err(|e| classify(e, "PutBucketPolicy"))?;
        Ok(())
    }

    async fn delete_policy(&self, bucket: &str, _condition: WriteCondition) -> CosiResult<()> {
        self.s3
            .delete_bucket_policy()
            .bucket(bucket)
            .send()
            .await
            .map_err(|e| classify(e, "DeleteBucketPolicy"))?;
        Ok(())
    }

    async fn get_user(&self, name: &str) -> CosiResult<User> {
        let output = self
            .iam
            .get_user()
            .user_name(name)
            .send()
            .await
            .map_err(|e| classify(e, "GetUser"))?;
        output
            .user()
            .map(to_user)
            .ok_or_else(|| cosi_error!(Internal, "GetUser returned no user for {name}"))
    }

    async fn create_user(&self, name: &str) -> CosiResult<User> {
        let output = self
            .iam
            .create_user()
            .user_name(name)
            .send()
            .await
            .map_err(|e| classify(e, "CreateUser"))?;
        output
            .user()
            .map(to_user)
            .ok_or_else(|| cosi_error!(Internal, "CreateUser returned no user for {name}"))
    }

    async fn delete_user(&self, name: &str) -> CosiResult<()> {
        self.iam
            .delete_user()
            .user_name(name)
            .send()
            .await
            .map_err(|e| classify(e, "DeleteUser"))?;
        Ok(())
    }

    async fn list_credentials(&self, user_name: &str) -> CosiResult<Vec<CredentialMetadata>> {
        let output = self
            .iam
            .list_access_keys()
            .user_name(user_name)
            .send()
            .await
            .map_err(|e| classify(e, "ListAccessKeys"))?;

        let keys = output
            .access_key_metadata()
            .iter()
            .filter_map(|k| {
                Some(CredentialMetadata {
                    access_key_id: k.access_key_id()?.to_owned(),
                    created_at: k.create_date().and_then(to_offset),
                })
            })
            .collect();
        Ok(keys)
    }

    async fn create_credential(&self, user_name: &str) -> CosiResult<Credential> {
        let output = self
            .iam
            .create_access_key()
            .user_name(user_name)
            .send()
            .await
            .map_err(|e| classify(e, "CreateAccessKey"))?;

        let Some(key) = output.access_key() else {
            return Err(cosi_error!(Internal, "CreateAccessKey returned no key for {user_name}"));
        };
        Ok(Credential {
            access_key_id: key.access_key_id().to_owned(),
            secret_access_key: SecretAccessKey::from(key.secret_access_key()),
            created_at: key.create_date().and_then(to_offset),
        })
    }

    async fn delete_credential(&self, user_name: &str, access_key_id: &str) -> CosiResult<()> {
        self.iam
            .delete_access_key()
            .user_name(user_name)
            .access_key_id(access_key_id)
            .send()
            .await
            .map_err(|e| classify(e, "DeleteAccessKey"))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use s3iam_core::CosiErrorCode;

    use aws_sdk_iam::operation::get_user::GetUserError;
    use aws_smithy_types::error::ErrorMetadata;

    fn service_error(code: &str) -> GetUserError {
        GetUserError::generic(ErrorMetadata::builder().code(code).message("test").build())
    }

    #[test]
    fn error_codes() {
        assert_eq!(classify(service_error("NoSuchEntity"), "GetUser").code(), CosiErrorCode::NotFound);
        assert_eq!(classify(service_error("NoSuchBucketPolicy"), "GetBucketPolicy").code(), CosiErrorCode::NotFound);
        assert_eq!(classify(service_error("EntityAlreadyExists"), "CreateUser").code(), CosiErrorCode::AlreadyExists);
        assert_eq!(classify(service_error("BucketAlreadyExists"), "CreateBucket").code(), CosiErrorCode::AlreadyExists);
        assert_eq!(classify(service_error("BucketAlreadyOwnedByYou"), "CreateBucket").code(), CosiErrorCode::AlreadyExists);
        assert_eq!(classify(service_error("NoSuchBucket"), "DeleteBucket").code(), CosiErrorCode::NotFound);
        assert_eq!(classify(service_error("BucketNotEmpty"), "DeleteBucket").code(), CosiErrorCode::Internal);
        assert_eq!(classify(service_error("LimitExceeded"), "CreateAccessKey").code(), CosiErrorCode::Internal);
        assert_eq!(classify(service_error("AccessDenied"), "GetUser").code(), CosiErrorCode::Internal);
    }

    fn params(tls_cert: &[u8]) -> BackendParams {
        BackendParams {
            endpoint: "https://s3.internal".to_owned(),
            s3_port: "443".to_owned(),
            iam_port: "8443".to_owned(),
            account_name: "tenant-a".to_owned(),
            access_key: "AKIAADMIN".to_owned(),
            secret_key: SecretAccessKey::from("admin-secret"),
            tls_cert: tls_cert.to_vec(),
            region: "us-east-1".to_owned(),
        }
    }

    #[tokio::test]
    async fn custom_ca_reaches_both_clients() {
        let backend = AwsBackend::new(&params(include_bytes!("../tests/data/ca.pem"))).unwrap();
        assert!(backend.s3.config().http_client().is_some());
        assert!(backend.iam.config().http_client().is_some());
    }

    #[test]
    fn timestamps() {
        let dt = aws_smithy_types::DateTime::from_secs(1_700_000_000);
        assert_eq!(to_offset(&dt).unwrap().unix_timestamp(), 1_700_000_000);
    }
}
