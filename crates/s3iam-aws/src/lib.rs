//! Bucket access provisioning backed by `aws-sdk-s3` and `aws-sdk-iam`
//!
//! [`AwsBackend`] implements [`s3iam_core::backend::Backend`] for any S3-compatible store that
//! exposes an IAM endpoint. [`BackendParams`](params::BackendParams) validates the account
//! secret the connection is built from.
//!
//! ```no_run
//! use std::collections::BTreeMap;
//! use std::sync::Arc;
//! use s3iam_aws::AwsBackend;
//! use s3iam_aws::params::BackendParams;
//! use s3iam_core::provisioner::Provisioner;
//!
//! # async fn run(secret: BTreeMap<String, Vec<u8>>) -> s3iam_core::CosiResult {
//! let params = BackendParams::from_secret_data(&secret)?;
//! let provisioner = Provisioner::new(Arc::new(AwsBackend::new(&params)?));
//!
//! provisioner.create_bucket("b1").await?;
//!
//! let user = provisioner.principal_name("ba-7d1f");
//! let actions = provisioner.resolve_actions(Some("rw"))?;
//! let cred = provisioner.grant_access("b1", &user, &actions).await?;
//! let secret_map = cred.to_secret_map(&params.full_endpoint(), &params.region);
//! # drop(secret_map);
//! # Ok(())
//! # }
//! ```

#![allow(
    clippy::module_name_repetitions,
    clippy::multiple_crate_versions, // Sometimes not fixable
    clippy::single_match_else,
)]

mod client;

pub mod params;

pub use self::client::AwsBackend;
