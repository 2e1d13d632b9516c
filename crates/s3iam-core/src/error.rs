use std::borrow::Cow;
use std::fmt;

/// Boxed error used as the source of a [`CosiError`].
pub type StdError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub type CosiResult<T = (), E = CosiError> = Result<T, E>;

/// Error class reported to the orchestration layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum CosiErrorCode {
    /// A principal, document or credential is absent where one is required.
    NotFound,
    /// A principal already exists.
    AlreadyExists,
    /// A malformed bucket or principal name, or an empty action set.
    InvalidArgument,
    /// A stored policy document could not be parsed.
    FormatError,
    /// A conditional write lost against a concurrent writer.
    Conflict,
    /// A remote call failed, timed out, or a document could not be encoded.
    Internal,
}

impl CosiErrorCode {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "NotFound",
            Self::AlreadyExists => "AlreadyExists",
            Self::InvalidArgument => "InvalidArgument",
            Self::FormatError => "FormatError",
            Self::Conflict => "Conflict",
            Self::Internal => "Internal",
        }
    }

    /// The gRPC status code the driver answers with.
    ///
    /// A document that fails to parse was corrupted out of band, so it is reported as `INTERNAL`.
    #[must_use]
    pub const fn as_grpc_code(&self) -> &'static str {
        match self {
            Self::NotFound => "NOT_FOUND",
            Self::AlreadyExists => "ALREADY_EXISTS",
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::Conflict => "ABORTED",
            Self::FormatError | Self::Internal => "INTERNAL",
        }
    }
}

impl fmt::Display for CosiErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provisioning error
#[derive(Debug)]
pub struct CosiError {
    code: CosiErrorCode,
    message: Option<Cow<'static, str>>,
    source: Option<StdError>,
}

impl CosiError {
    #[must_use]
    pub fn new(code: CosiErrorCode) -> Self {
        Self {
            code,
            message: None,
            source: None,
        }
    }

    #[must_use]
    pub fn with_message(code: CosiErrorCode, message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            code,
            message: Some(message.into()),
            source: None,
        }
    }

    #[must_use]
    pub fn with_source(code: CosiErrorCode, source: StdError) -> Self {
        Self {
            code,
            message: None,
            source: Some(source),
        }
    }

    pub fn set_source(&mut self, source: StdError) {
        self.source = Some(source);
    }

    pub fn set_message(&mut self, message: impl Into<Cow<'static, str>>) {
        self.message = Some(message.into());
    }

    #[must_use]
    pub fn code(&self) -> CosiErrorCode {
        self.code
    }

    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    #[must_use]
    pub fn source(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        self.source.as_deref()
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.code == CosiErrorCode::NotFound
    }

    #[must_use]
    pub fn is_already_exists(&self) -> bool {
        self.code == CosiErrorCode::AlreadyExists
    }

    #[must_use]
    pub fn is_conflict(&self) -> bool {
        self.code == CosiErrorCode::Conflict
    }
}

impl From<CosiErrorCode> for CosiError {
    fn from(code: CosiErrorCode) -> Self {
        Self::new(code)
    }
}

impl From<s3iam_policy::PolicyError> for CosiError {
    fn from(err: s3iam_policy::PolicyError) -> Self {
        let code = match err {
            s3iam_policy::PolicyError::Malformed(_) => CosiErrorCode::FormatError,
            s3iam_policy::PolicyError::Serialize(_) => CosiErrorCode::Internal,
        };
        Self::with_source(code, Box::new(err))
    }
}

impl fmt::Display for CosiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code)?;
        if let Some(msg) = &self.message {
            write!(f, ": {msg}")?;
        }
        if let Some(source) = &self.source {
            write!(f, ": {source}")?;
        }
        Ok(())
    }
}

impl std::error::Error for CosiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_deref().map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// Creates a [`CosiError`].
///
/// ```
/// use s3iam_core::{cosi_error, CosiErrorCode};
///
/// let err = cosi_error!(NotFound, "user {} does not exist", "cosi-user-1");
/// assert_eq!(err.code(), CosiErrorCode::NotFound);
/// assert_eq!(err.message(), Some("user cosi-user-1 does not exist"));
///
/// let io = std::io::Error::other("connection reset");
/// let err = cosi_error!(io, Internal, "failed to reach backend");
/// assert!(err.source().is_some());
/// ```
#[macro_export]
macro_rules! cosi_error {
    ($source:expr, $code:ident) => {{
        let mut err = $crate::CosiError::new($crate::CosiErrorCode::$code);
        err.set_source(Box::new($source));
        err
    }};
    ($source:expr, $code:ident, $($arg:tt)+) => {{
        let mut err = $crate::CosiError::with_message($crate::CosiErrorCode::$code, format!($($arg)+));
        err.set_source(Box::new($source));
        err
    }};
    ($code:ident) => {
        $crate::CosiError::new($crate::CosiErrorCode::$code)
    };
    ($code:ident, $($arg:tt)+) => {
        $crate::CosiError::with_message($crate::CosiErrorCode::$code, format!($($arg)+))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display() {
        let err = cosi_error!(InvalidArgument, "empty action set");
        assert_eq!(err.to_string(), "InvalidArgument: empty action set");

        let err = CosiError::new(CosiErrorCode::Internal);
        assert_eq!(err.to_string(), "Internal");
    }

    #[test]
    fn policy_errors_are_classified() {
        let malformed = s3iam_policy::Policy::parse(b"{").unwrap_err();
        let err = CosiError::from(malformed);
        assert_eq!(err.code(), CosiErrorCode::FormatError);
        assert_eq!(err.code().as_grpc_code(), "INTERNAL");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn grpc_codes() {
        assert_eq!(CosiErrorCode::NotFound.as_grpc_code(), "NOT_FOUND");
        assert_eq!(CosiErrorCode::AlreadyExists.as_grpc_code(), "ALREADY_EXISTS");
        assert_eq!(CosiErrorCode::InvalidArgument.as_grpc_code(), "INVALID_ARGUMENT");
        assert_eq!(CosiErrorCode::Conflict.as_grpc_code(), "ABORTED");
        assert_eq!(CosiErrorCode::Internal.as_grpc_code(), "INTERNAL");
    }
}
