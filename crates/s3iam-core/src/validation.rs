//! Input validation

use crate::error::CosiResult;

use s3iam_policy::ActionList;

/// Checks a bucket name against the S3 naming rules.
///
/// Up to 63 characters of lowercase letters, digits, `.` and `-`, beginning and ending with a
/// letter or digit, with no `..` and not shaped like an IPv4 address. The 3 character minimum of
/// AWS is not enforced; S3-compatible stores accept shorter names.
#[must_use]
pub fn is_valid_bucket_name(name: &str) -> bool {
    if !(1..=63).contains(&name.len()) {
        return false;
    }

    let bytes = name.as_bytes();
    let is_edge = |b: u8| b.is_ascii_lowercase() || b.is_ascii_digit();
    if !is_edge(bytes[0]) || !is_edge(bytes[bytes.len() - 1]) {
        return false;
    }

    if !bytes.iter().all(|&b| is_edge(b) || b == b'.' || b == b'-') {
        return false;
    }

    if name.contains("..") {
        return false;
    }

    name.parse::<std::net::Ipv4Addr>().is_err()
}

/// Checks a user name against the IAM naming rules.
///
/// 1 to 64 characters of ASCII letters, digits and `+=,.@_-`.
#[must_use]
pub fn is_valid_user_name(name: &str) -> bool {
    (1..=64).contains(&name.len())
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b"+=,.@_-".contains(&b))
}

pub(crate) fn check_bucket_name(bucket: &str) -> CosiResult {
    if is_valid_bucket_name(bucket) {
        Ok(())
    } else {
        Err(cosi_error!(InvalidArgument, "invalid bucket name: {bucket:?}"))
    }
}

pub(crate) fn check_user_name(name: &str) -> CosiResult {
    if is_valid_user_name(name) {
        Ok(())
    } else {
        Err(cosi_error!(InvalidArgument, "invalid principal name: {name:?}"))
    }
}

pub(crate) fn check_actions(actions: &ActionList) -> CosiResult {
    if actions.is_empty() {
        return Err(cosi_error!(InvalidArgument, "empty action set"));
    }
    if actions.iter().any(str::is_empty) {
        return Err(cosi_error!(InvalidArgument, "empty action name"));
    }
    Ok(())
}
