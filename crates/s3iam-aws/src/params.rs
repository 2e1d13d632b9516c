//! Connection parameters
//!
//! The driver reads the object store's connection details from an account secret whose data
//! keys are [`ENDPOINT`], [`S3_PORT`], [`IAM_PORT`], [`ACCOUNT_NAME`], [`ACCESS_KEY`],
//! [`SECRET_KEY`], [`REGION`] and [`TLS_CERT`].

use s3iam_core::CosiResult;
use s3iam_core::cosi_error;
use s3iam_core::credential::SecretAccessKey;

use std::collections::BTreeMap;

use tracing::warn;

pub const ENDPOINT: &str = "Endpoint";
pub const S3_PORT: &str = "S3Port";
pub const IAM_PORT: &str = "IAMPort";
pub const ACCOUNT_NAME: &str = "AccountName";
pub const ACCESS_KEY: &str = "AccessKey";
pub const SECRET_KEY: &str = "SecretKey";
pub const REGION: &str = "Region";
pub const TLS_CERT: &str = "TlsCert";

/// Region used when the secret names none.
pub const DEFAULT_REGION: &str = "us-east-1";

const PEM_CERTIFICATE_MARKER: &[u8] = b"-----BEGIN CERTIFICATE-----";

/// Bucket class parameter naming the account secret.
pub const ACCOUNT_SECRET_PARAM: &str = "accountSecret";

/// Bucket class parameter naming the account secret's namespace.
pub const ACCOUNT_SECRET_NAMESPACE_PARAM: &str = "accountSecretNamespace";

/// Validated connection parameters.
#[derive(Debug, Clone)]
pub struct BackendParams {
    /// Base URL including the scheme, e.g. `https://s3.example.com`.
    pub endpoint: String,
    pub s3_port: String,
    pub iam_port: String,
    pub account_name: String,
    pub access_key: String,
    pub secret_key: SecretAccessKey,
    /// PEM-encoded CA bundle. Empty if the endpoint uses a publicly trusted certificate.
    pub tls_cert: Vec<u8>,
    pub region: String,
}

impl BackendParams {
    /// Builds the parameters from the data of an account secret.
    ///
    /// # Errors
    /// Returns `InvalidArgument` if a required key is missing or empty, a value is not UTF-8,
    /// the endpoint has no `http://` or `https://` scheme, the region is malformed, or a TLS
    /// certificate is given that holds no PEM certificate block.
    pub fn from_secret_data(data: &BTreeMap<String, Vec<u8>>) -> CosiResult<Self> {
        let text = |key: &str| -> CosiResult<String> {
            match data.get(key) {
                Some(v) => String::from_utf8(v.clone()).map_err(|e| cosi_error!(e, InvalidArgument, "{key} is not valid UTF-8")),
                None => Ok(String::new()),
            }
        };

        let endpoint = text(ENDPOINT)?;
        let s3_port = text(S3_PORT)?;
        let iam_port = text(IAM_PORT)?;
        let account_name = text(ACCOUNT_NAME)?;
        let access_key = text(ACCESS_KEY)?;
        let secret_key = text(SECRET_KEY)?;
        let mut region = text(REGION)?;
        let tls_cert = data.get(TLS_CERT).cloned().unwrap_or_default();

        if endpoint.is_empty() || access_key.is_empty() || secret_key.is_empty() {
            return Err(cosi_error!(InvalidArgument, "endpoint, access key and secret key are required"));
        }
        if s3_port.is_empty() || iam_port.is_empty() {
            return Err(cosi_error!(InvalidArgument, "S3 port and IAM port are required"));
        }
        if account_name.is_empty() {
            return Err(cosi_error!(InvalidArgument, "account name is required"));
        }
        if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
            return Err(cosi_error!(InvalidArgument, "endpoint must include http:// or https:// protocol"));
        }

        if !tls_cert.is_empty() && !tls_cert.windows(PEM_CERTIFICATE_MARKER.len()).any(|w| w == PEM_CERTIFICATE_MARKER) {
            return Err(cosi_error!(InvalidArgument, "{TLS_CERT} is not a PEM certificate"));
        }

        if region.is_empty() {
            warn!(region = DEFAULT_REGION, "region is not set, using default region");
            region = DEFAULT_REGION.to_owned();
        } else if !is_valid_region(&region) {
            return Err(cosi_error!(InvalidArgument, "invalid region: {region:?}"));
        }

        Ok(Self {
            endpoint,
            s3_port,
            iam_port,
            account_name,
            access_key,
            secret_key: SecretAccessKey::from(secret_key),
            tls_cert,
            region,
        })
    }

    /// The S3 endpoint with its port.
    ///
    /// An endpoint that already carries a port is returned as is.
    #[must_use]
    pub fn full_endpoint(&self) -> String {
        if has_port(&self.endpoint) || self.s3_port.is_empty() {
            return self.endpoint.clone();
        }
        format!("{}:{}", self.endpoint, self.s3_port)
    }

    /// The IAM endpoint with its port. IAM is always reached over `https://`.
    #[must_use]
    pub fn full_iam_endpoint(&self) -> String {
        let host = self
            .endpoint
            .strip_prefix("http://")
            .or_else(|| self.endpoint.strip_prefix("https://"))
            .unwrap_or(&self.endpoint);

        let full = if has_port(host) || self.iam_port.is_empty() {
            format!("https://{host}")
        } else {
            format!("https://{host}:{}", self.iam_port)
        };
        tracing::debug!(endpoint = %self.endpoint, iam_endpoint = %full, "constructed IAM endpoint");
        full
    }
}

/// Whether `endpoint` contains a `:<digits>` port.
fn has_port(endpoint: &str) -> bool {
    endpoint
        .match_indices(':')
        .any(|(i, _)| endpoint[i + 1..].starts_with(|c: char| c.is_ascii_digit()))
}

/// Checks a region name: lowercase letters, digits and single hyphens, starting with a letter
/// and not ending with a hyphen. `us-east-1`, `us-gov-west-1` and `local` all pass.
#[must_use]
pub fn is_valid_region(s: &str) -> bool {
    let Some(first) = s.bytes().next() else { return false };
    first.is_ascii_lowercase()
        && s.bytes().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
        && !s.ends_with('-')
        && !s.contains("--")
}

/// Locates the account secret from a bucket class's parameters.
///
/// The namespace comes from `accountSecretNamespace`, falling back to `pod_namespace` (the
/// driver's own `POD_NAMESPACE`). Returns `(name, namespace)`.
///
/// # Errors
/// Returns `InvalidArgument` if either is missing.
pub fn secret_ref(parameters: &BTreeMap<String, String>, pod_namespace: Option<&str>) -> CosiResult<(String, String)> {
    let name = parameters.get(ACCOUNT_SECRET_PARAM).map_or("", String::as_str);
    let namespace = match parameters.get(ACCOUNT_SECRET_NAMESPACE_PARAM) {
        Some(ns) if !ns.is_empty() => ns.as_str(),
        _ => pod_namespace.unwrap_or(""),
    };
    if name.is_empty() || namespace.is_empty() {
        return Err(cosi_error!(InvalidArgument, "accountSecret and accountSecretNamespace are required"));
    }
    Ok((name.to_owned(), namespace.to_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;

    use s3iam_core::CosiErrorCode;

    fn secret(entries: &[(&str, &str)]) -> BTreeMap<String, Vec<u8>> {
        entries.iter().map(|(k, v)| ((*k).to_owned(), v.as_bytes().to_vec())).collect()
    }

    fn complete() -> BTreeMap<String, Vec<u8>> {
        secret(&[
            (ENDPOINT, "https://s3.example.com"),
            (S3_PORT, "443"),
            (IAM_PORT, "8443"),
            (ACCOUNT_NAME, "tenant-a"),
            (ACCESS_KEY, "AKIAADMIN"),
            (SECRET_KEY, "admin-secret"),
            (REGION, "eu-west-2"),
        ])
    }

    #[test]
    fn parse_complete_secret() {
        let params = BackendParams::from_secret_data(&complete()).unwrap();
        assert_eq!(params.endpoint, "https://s3.example.com");
        assert_eq!(params.account_name, "tenant-a");
        assert_eq!(params.secret_key.expose(), "admin-secret");
        assert_eq!(params.region, "eu-west-2");
        assert!(params.tls_cert.is_empty());
        assert!(!format!("{params:?}").contains("admin-secret"));
    }

    #[test]
    fn missing_values() {
        for key in [ENDPOINT, ACCESS_KEY, SECRET_KEY, S3_PORT, IAM_PORT, ACCOUNT_NAME] {
            let mut data = complete();
            data.remove(key);
            let err = BackendParams::from_secret_data(&data).unwrap_err();
            assert_eq!(err.code(), CosiErrorCode::InvalidArgument, "{key}");

            data.insert(key.to_owned(), Vec::new());
            assert!(BackendParams::from_secret_data(&data).is_err(), "{key}");
        }
    }

    #[test]
    fn endpoint_needs_scheme() {
        let mut data = complete();
        data.insert(ENDPOINT.to_owned(), b"s3.example.com".to_vec());
        let err = BackendParams::from_secret_data(&data).unwrap_err();
        assert_eq!(err.code(), CosiErrorCode::InvalidArgument);
    }

    #[test]
    fn region_default_and_validation() {
        let mut data = complete();
        data.remove(REGION);
        assert_eq!(BackendParams::from_secret_data(&data).unwrap().region, DEFAULT_REGION);

        data.insert(REGION.to_owned(), b"Not A Region".to_vec());
        assert!(BackendParams::from_secret_data(&data).is_err());

        assert!(is_valid_region("us-gov-west-1"));
        assert!(is_valid_region("local"));
        assert!(!is_valid_region("-us-east-1"));
        assert!(!is_valid_region("us--east-1"));
        assert!(!is_valid_region("1us-east"));
    }

    #[test]
    fn tls_certificate() {
        let mut data = complete();
        data.insert(TLS_CERT.to_owned(), include_bytes!("../tests/data/ca.pem").to_vec());
        let params = BackendParams::from_secret_data(&data).unwrap();
        assert!(params.tls_cert.starts_with(PEM_CERTIFICATE_MARKER));

        data.insert(TLS_CERT.to_owned(), b"not a certificate".to_vec());
        let err = BackendParams::from_secret_data(&data).unwrap_err();
        assert_eq!(err.code(), CosiErrorCode::InvalidArgument);
    }

    #[test]
    fn non_utf8_value() {
        let mut data = complete();
        data.insert(ACCOUNT_NAME.to_owned(), vec![0xff, 0xfe]);
        let err = BackendParams::from_secret_data(&data).unwrap_err();
        assert_eq!(err.code(), CosiErrorCode::InvalidArgument);
    }

    #[test]
    fn endpoints() {
        let mut params = BackendParams::from_secret_data(&complete()).unwrap();
        assert_eq!(params.full_endpoint(), "https://s3.example.com:443");
        assert_eq!(params.full_iam_endpoint(), "https://s3.example.com:8443");

        params.endpoint = "http://minio.local:9000".to_owned();
        assert_eq!(params.full_endpoint(), "http://minio.local:9000");
        assert_eq!(params.full_iam_endpoint(), "https://minio.local:9000");

        params.endpoint = "http://10.0.0.5".to_owned();
        assert_eq!(params.full_endpoint(), "http://10.0.0.5:443");
        assert_eq!(params.full_iam_endpoint(), "https://10.0.0.5:8443");
    }

    #[test]
    fn account_secret_location() {
        let mut parameters = BTreeMap::from([(ACCOUNT_SECRET_PARAM.to_owned(), "s3-admin".to_owned())]);
        assert_eq!(
            secret_ref(&parameters, Some("cosi-system")).unwrap(),
            ("s3-admin".to_owned(), "cosi-system".to_owned())
        );

        parameters.insert(ACCOUNT_SECRET_NAMESPACE_PARAM.to_owned(), "tenant-a".to_owned());
        assert_eq!(secret_ref(&parameters, Some("cosi-system")).unwrap().1, "tenant-a");

        parameters.remove(ACCOUNT_SECRET_NAMESPACE_PARAM);
        assert!(secret_ref(&parameters, None).is_err());
        assert!(secret_ref(&BTreeMap::new(), Some("cosi-system")).is_err());
    }
}
