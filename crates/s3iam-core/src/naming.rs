//! Naming conventions

/// Derives the user name of a grant: `<prefix><grant_id>`.
///
/// ```
/// assert_eq!(s3iam_core::naming::principal_name("cosi-user-", "ba-42"), "cosi-user-ba-42");
/// ```
#[must_use]
pub fn principal_name(prefix: &str, grant_id: &str) -> String {
    format!("{prefix}{grant_id}")
}

/// Extracts the bucket access object's uid from a grant id, which may carry a `ba-` prefix.
///
/// ```
/// assert_eq!(s3iam_core::naming::bucket_access_uid("ba-7d1f"), "7d1f");
/// assert_eq!(s3iam_core::naming::bucket_access_uid("7d1f"), "7d1f");
/// ```
#[must_use]
pub fn bucket_access_uid(grant_id: &str) -> &str {
    grant_id.strip_prefix("ba-").unwrap_or(grant_id)
}
