use crate::serde_util::one_or_many;

use serde::{Deserialize, Serialize};

/// Returns the ARN of a bucket: `arn:aws:s3:::<bucket>`.
#[must_use]
pub fn bucket_arn(bucket: &str) -> String {
    format!("arn:aws:s3:::{bucket}")
}

/// Returns the ARN covering every object in a bucket: `arn:aws:s3:::<bucket>/*`.
#[must_use]
pub fn bucket_objects_arn(bucket: &str) -> String {
    format!("arn:aws:s3:::{bucket}/*")
}

/// The `Resource` field of a statement.
///
/// Always serialized as an array. A bare string is accepted when parsing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceList(#[serde(deserialize_with = "one_or_many")] Vec<String>);

impl ResourceList {
    /// The resource pair scoping a statement to one bucket and all of its objects.
    #[must_use]
    pub fn bucket(bucket: &str) -> Self {
        Self(vec![bucket_arn(bucket), bucket_objects_arn(bucket)])
    }

    #[must_use]
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    #[must_use]
    pub fn into_vec(self) -> Vec<String> {
        self.0
    }
}

impl From<Vec<String>> for ResourceList {
    fn from(v: Vec<String>) -> Self {
        Self(v)
    }
}
