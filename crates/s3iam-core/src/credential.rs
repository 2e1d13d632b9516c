//! Access keys

use std::collections::BTreeMap;
use std::fmt;

use time::OffsetDateTime;
use zeroize::Zeroize;

/// The secret half of an access key.
///
/// The backend hands it out exactly once, when the key is created. It is wiped on drop and
/// never printed by `Debug`.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretAccessKey(Box<str>);

impl SecretAccessKey {
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl From<String> for SecretAccessKey {
    fn from(s: String) -> Self {
        Self(s.into_boxed_str())
    }
}

impl From<&str> for SecretAccessKey {
    fn from(s: &str) -> Self {
        Self(s.into())
    }
}

impl Drop for SecretAccessKey {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl fmt::Debug for SecretAccessKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretAccessKey(**)")
    }
}

/// A freshly issued access key, including its secret.
#[derive(Debug, Clone)]
pub struct Credential {
    pub access_key_id: String,
    pub secret_access_key: SecretAccessKey,
    pub created_at: Option<OffsetDateTime>,
}

impl Credential {
    /// The `s3` credential map returned to the workload:
    /// `accessKeyID`, `accessSecretKey`, `endpoint` and `region`.
    #[must_use]
    pub fn to_secret_map(&self, endpoint: &str, region: &str) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("accessKeyID".to_owned(), self.access_key_id.clone()),
            ("accessSecretKey".to_owned(), self.secret_access_key.expose().to_owned()),
            ("endpoint".to_owned(), endpoint.to_owned()),
            ("region".to_owned(), region.to_owned()),
        ])
    }

    #[must_use]
    pub fn metadata(&self) -> CredentialMetadata {
        CredentialMetadata {
            access_key_id: self.access_key_id.clone(),
            created_at: self.created_at,
        }
    }
}

/// What the backend reports about an existing access key. The secret is never part of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialMetadata {
    pub access_key_id: String,
    pub created_at: Option<OffsetDateTime>,
}

/// Picks the most recently created key.
///
/// Keys without a creation time sort first; on an exact tie the first one listed wins.
#[must_use]
pub fn newest(keys: &[CredentialMetadata]) -> Option<&CredentialMetadata> {
    keys.iter().fold(None, |best, key| match best {
        Some(b) if key.created_at <= b.created_at => Some(b),
        _ => Some(key),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(id: &str, secs: Option<i64>) -> CredentialMetadata {
        CredentialMetadata {
            access_key_id: id.to_owned(),
            created_at: secs.map(|s| OffsetDateTime::from_unix_timestamp(s).unwrap()),
        }
    }

    #[test]
    fn newest_by_timestamp() {
        let keys = [key("A", Some(10)), key("B", Some(30)), key("C", Some(20))];
        assert_eq!(newest(&keys).unwrap().access_key_id, "B");
    }

    #[test]
    fn newest_tie_first_seen() {
        let keys = [key("A", Some(10)), key("B", Some(10))];
        assert_eq!(newest(&keys).unwrap().access_key_id, "A");
    }

    #[test]
    fn newest_missing_timestamps() {
        let keys = [key("A", None), key("B", Some(1)), key("C", None)];
        assert_eq!(newest(&keys).unwrap().access_key_id, "B");
        assert!(newest(&[]).is_none());
    }

    #[test]
    fn secret_is_redacted() {
        let cred = Credential {
            access_key_id: "AKIAEXAMPLE".to_owned(),
            secret_access_key: SecretAccessKey::from("wJalrXUtnFEMI"),
            created_at: None,
        };
        let debug = format!("{cred:?}");
        assert!(debug.contains("AKIAEXAMPLE"));
        assert!(!debug.contains("wJalrXUtnFEMI"));
    }

    #[test]
    fn secret_map_keys() {
        let cred = Credential {
            access_key_id: "AKIAEXAMPLE".to_owned(),
            secret_access_key: SecretAccessKey::from("secret"),
            created_at: None,
        };
        let map = cred.to_secret_map("https://s3.example.com:443", "us-east-1");
        assert_eq!(map["accessKeyID"], "AKIAEXAMPLE");
        assert_eq!(map["accessSecretKey"], "secret");
        assert_eq!(map["endpoint"], "https://s3.example.com:443");
        assert_eq!(map["region"], "us-east-1");
        assert_eq!(map.len(), 4);
    }
}
