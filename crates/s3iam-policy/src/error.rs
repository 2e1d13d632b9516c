/// Errors returned when reading or writing a policy document.
#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    /// The bytes are not a well-formed policy document.
    #[error("PolicyError: Malformed: {0}")]
    Malformed(#[source] serde_json::Error),

    /// The document could not be encoded as JSON.
    #[error("PolicyError: Serialize: {0}")]
    Serialize(#[source] serde_json::Error),
}
