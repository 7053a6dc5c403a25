use thiserror::Error;

/// Everything that can go wrong between reading the request and relaying the
/// Lambda response. Each variant's Display output is the exact message placed
/// in the JSON response, so the prefixes are part of the external contract.
#[derive(Debug, Error)]
pub(crate) enum RelayError {
    /// The request body had no usable `s3_path` field.
    #[error("Missing s3_path parameter")]
    MissingPath,

    /// S3 could not return the object (missing key, access denied, network).
    #[error("AWS Error: {0}")]
    Storage(String),

    /// The object content is not valid JSON even after normalization.
    /// Carries the start of the content for diagnostics.
    #[error("JSON Error: {message}\nFirst 100 chars of content: {snippet}")]
    Decode { message: String, snippet: String },

    /// The function itself failed: empty payload, or an error reported
    /// inside the invocation payload.
    #[error("{0}")]
    Invocation(String),

    /// The invoke call never completed: timeout, throttling, permissions.
    #[error("Lambda Error: {0}")]
    Transport(String),
}
