use thiserror::Error;

/// Conversion error types.
///
/// Unmappable terminology never errors (it falls back to documented
/// defaults); these variants are the genuinely fatal cases that reject
/// the whole record.
#[derive(Debug, Error)]
pub enum ConvertError {
    /// A vital sign may carry at most one result value.
    #[error("vital sign has {0} result values, at most one is supported")]
    TooManyResultValues(usize),

    /// The patient record could not be parsed at all.
    #[error("invalid patient record: {0}")]
    InvalidRecord(#[from] serde_json::Error),
}
