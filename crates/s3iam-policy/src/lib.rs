//! S3 bucket policy documents
//!
//! This crate models the JSON access-control documents attached to S3 buckets, as far as the
//! provisioning engine needs to read and edit them.
//!
//! # Wire format
//!
//! ```json
//! {
//!   "Version": "2012-10-17",
//!   "Statement": [
//!     {
//!       "Effect": "Allow",
//!       "Principal": { "AWS": ["AIDAEXAMPLE"] },
//!       "Action": ["s3:GetObject"],
//!       "Resource": ["arn:aws:s3:::b1", "arn:aws:s3:::b1/*"]
//!     }
//!   ]
//! }
//! ```
//!
//! `Principal` is either the literal `"*"` or an object of identity lists, and `Action` is either
//! the literal `"s3:*"` or an array of action names. Both shapes are modeled as tagged variants,
//! see [`Principal`] and [`ActionList`].
//!
//! Serialization is deterministic: fields are emitted in declaration order and the output is
//! indented with two spaces, so that documents written by the engine diff cleanly.
//!
//! # Example
//!
//! ```
//! use s3iam_policy::{ActionList, Policy, Statement};
//!
//! let mut policy = Policy::new();
//! policy.push(Statement::allow("AIDAALICE", ActionList::from_iter(["s3:GetObject"]), "b1"));
//!
//! let json = policy.to_json().unwrap();
//! let parsed = Policy::parse(json.as_bytes()).unwrap();
//! assert_eq!(parsed, policy);
//! assert!(parsed.contains_principal("AIDAALICE"));
//! ```

#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate, //
)]

mod action;
mod error;
mod policy;
mod principal;
mod resource;
mod serde_util;
mod statement;

pub use self::action::{ANY_ACTION, ActionList};
pub use self::error::PolicyError;
pub use self::policy::{POLICY_VERSION, Policy};
pub use self::principal::{AWS_PRINCIPAL_KEY, ANY_PRINCIPAL, Principal};
pub use self::resource::{ResourceList, bucket_arn, bucket_objects_arn};
pub use self::statement::{Effect, Statement};
