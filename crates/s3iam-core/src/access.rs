//! Access modes
//!
//! A bucket access class selects one of five access modes through the
//! [`ACCESS_MODE_ANNOTATION`] annotation. Each mode expands to a fixed list of S3 actions that
//! is written into the grant's policy statement.

use crate::error::CosiResult;

use std::fmt;
use std::str::FromStr;

use s3iam_policy::ActionList;
use serde::{Deserialize, Serialize};

/// Driver name, also used as the annotation namespace.
pub const DRIVER_NAME: &str = "s3-iam.objectstorage.k8s.io";

/// Annotation on a bucket access class that selects the access mode.
pub const ACCESS_MODE_ANNOTATION: &str = "s3-iam.objectstorage.k8s.io/access-mode";

const READ_ONLY_ACTIONS: &[&str] = &[
    "s3:GetObject",
    "s3:GetObjectVersion",
    "s3:GetObjectTagging",
    "s3:ListBucket",
    "s3:GetBucketLocation",
];

const WRITE_ACTIONS: &[&str] = &[
    "s3:PutObject",
    "s3:DeleteObject",
    "s3:PutObjectTagging",
    "s3:AbortMultipartUpload",
    "s3:ListMultipartUploadParts",
    "s3:ListBucketMultipartUploads",
];

const WRITE_ONLY_ACTIONS: &[&str] = &["s3:PutObject", "s3:AbortMultipartUpload", "s3:ListMultipartUploadParts"];

const LIST_ONLY_ACTIONS: &[&str] = &["s3:ListBucket", "s3:GetBucketLocation"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccessMode {
    #[serde(rename = "ro")]
    ReadOnly,
    #[serde(rename = "rw")]
    ReadWrite,
    #[serde(rename = "wo")]
    WriteOnly,
    #[serde(rename = "lo")]
    ListOnly,
    #[serde(rename = "admin")]
    Admin,
}

impl AccessMode {
    pub const ALL: [AccessMode; 5] = [
        AccessMode::ReadOnly,
        AccessMode::ReadWrite,
        AccessMode::WriteOnly,
        AccessMode::ListOnly,
        AccessMode::Admin,
    ];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            AccessMode::ReadOnly => "ro",
            AccessMode::ReadWrite => "rw",
            AccessMode::WriteOnly => "wo",
            AccessMode::ListOnly => "lo",
            AccessMode::Admin => "admin",
        }
    }

    /// The actions granted by this mode, in the order they are written.
    #[must_use]
    pub fn allowed_actions(&self) -> ActionList {
        match self {
            AccessMode::ReadOnly => ActionList::from_iter(READ_ONLY_ACTIONS.iter().copied()),
            AccessMode::ReadWrite => ActionList::from_iter(READ_ONLY_ACTIONS.iter().chain(WRITE_ACTIONS).copied()),
            AccessMode::WriteOnly => ActionList::from_iter(WRITE_ONLY_ACTIONS.iter().copied()),
            AccessMode::ListOnly => ActionList::from_iter(LIST_ONLY_ACTIONS.iter().copied()),
            AccessMode::Admin => ActionList::Any,
        }
    }

    /// Resolves the annotation value of a bucket access class.
    ///
    /// A missing or empty annotation selects `default`.
    ///
    /// # Errors
    /// Returns `InvalidArgument` for an unknown mode.
    pub fn from_annotation(value: Option<&str>, default: AccessMode) -> CosiResult<Self> {
        match value.map(str::trim) {
            None | Some("") => Ok(default),
            Some(s) => s.parse().map_err(|e: ParseAccessModeError| {
                tracing::error!(mode = s, "invalid access mode");
                cosi_error!(e, InvalidArgument, "invalid access mode")
            }),
        }
    }
}

impl fmt::Display for AccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("ParseAccessModeError: unknown access mode {0:?}")]
pub struct ParseAccessModeError(String);

impl FromStr for AccessMode {
    type Err = ParseAccessModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|mode| mode.as_str() == s)
            .ok_or_else(|| ParseAccessModeError(s.to_owned()))
    }
}
