use s3iam_aws::AwsBackend;
use s3iam_aws::params::{self, BackendParams};
use s3iam_core::backend::Backend;
use s3iam_core::provisioner::Provisioner;

use std::collections::BTreeMap;
use std::sync::Arc;

fn params() -> BackendParams {
    let data: BTreeMap<String, Vec<u8>> = [
        (params::ENDPOINT, "http://127.0.0.1"),
        (params::S3_PORT, "9000"),
        (params::IAM_PORT, "9443"),
        (params::ACCOUNT_NAME, "tenant-a"),
        (params::ACCESS_KEY, "AKIAADMIN"),
        (params::SECRET_KEY, "admin-secret"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_owned(), v.as_bytes().to_vec()))
    .collect();
    BackendParams::from_secret_data(&data).unwrap()
}

#[tokio::test]
async fn builds_without_connecting() {
    let params = params();
    assert_eq!(params.region, params::DEFAULT_REGION);
    assert_eq!(params.full_endpoint(), "http://127.0.0.1:9000");
    assert_eq!(params.full_iam_endpoint(), "https://127.0.0.1:9443");

    let backend = AwsBackend::new(&params).unwrap();
    assert!(!backend.supports_conditional_writes());

    let provisioner = Provisioner::new(Arc::new(backend));
    assert_eq!(provisioner.principal_name("ba-7d1f"), "cosi-user-ba-7d1f");
}

#[tokio::test]
async fn builds_with_custom_ca() {
    let mut params = params();
    params.tls_cert = include_bytes!("data/ca.pem").to_vec();
    let backend = AwsBackend::new(&params).unwrap();
    assert!(!backend.supports_conditional_writes());
}
