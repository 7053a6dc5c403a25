use crate::errors::RelayError;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::Client as S3Client;
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;
use tracing::{debug, info};

/// Contains compiled regex for the NaN token substitution.
static NAN_REGEX: OnceLock<Regex> = OnceLock::new();

/// Read-only view of the object store: one key in, raw bytes out.
pub(crate) trait ObjectStore {
    fn fetch(&self, key: &str) -> impl std::future::Future<Output = Result<Vec<u8>, RelayError>> + Send;
}

/// The live S3 collaborator. The bucket is fixed at construction;
/// only the key varies per request.
pub(crate) struct S3Store {
    client: S3Client,
    bucket: String,
}

impl S3Store {
    pub(crate) fn new(client: S3Client, bucket: String) -> Self {
        Self { client, bucket }
    }
}

impl ObjectStore for S3Store {
    /// Retrieves the object content in one attempt. Any provider error
    /// (missing key, access denied, network) is surfaced immediately.
    async fn fetch(&self, key: &str) -> Result<Vec<u8>, RelayError> {
        let object = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| RelayError::Storage(DisplayErrorContext(&e).to_string()))?;

        let body = object
            .body
            .collect()
            .await
            .map_err(|e| RelayError::Storage(e.to_string()))?;

        Ok(body.into_bytes().to_vec())
    }
}

/// Fetches the object and decodes it as JSON, tolerating the one known
/// non-standard token some upstream producers emit.
pub(crate) async fn fetch_document<S: ObjectStore>(store: &S, key: &str) -> Result<Value, RelayError> {
    let raw = store.fetch(key).await?;
    info!("Fetched {} bytes for key {}", raw.len(), key);

    decode_document(&raw)
}

/// Decodes the object content as JSON after replacing `NaN` value tokens
/// with `null`. Only `NaN` followed by a comma is replaced: a trailing `NaN`
/// before a closing brace or bracket is left as-is and fails decoding.
pub(crate) fn decode_document(raw: &[u8]) -> Result<Value, RelayError> {
    let content = String::from_utf8_lossy(raw);

    let regex =
        NAN_REGEX.get_or_init(|| Regex::new(r":\s*NaN\s*,").expect("Invalid NaN token regex. It's a bug."));
    let content = regex.replace_all(&content, ": null,");

    serde_json::from_str::<Value>(&content).map_err(|e| {
        debug!("Failed to decode object content: {}", e);

        RelayError::Decode {
            message: e.to_string(),
            snippet: content.chars().take(100).collect(),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn nan_before_comma_is_normalized() {
        let doc = decode_document(br#"{"a": NaN, "b": 1}"#).expect("must decode after normalization");
        assert_eq!(doc, json!({"a": null, "b": 1}));
    }

    #[test]
    fn nan_without_spacing_is_normalized() {
        let doc = decode_document(br#"{"a":NaN,"b":2}"#).expect("must decode after normalization");
        assert_eq!(doc, json!({"a": null, "b": 2}));
    }

    /// A trailing NaN is outside the substitution pattern. This is the
    /// documented limitation, not a bug.
    #[test]
    fn trailing_nan_still_fails_decoding() {
        let err = decode_document(br#"{"a":1,"b":NaN}"#).expect_err("trailing NaN must not decode");
        match err {
            RelayError::Decode { snippet, .. } => {
                assert!(snippet.contains("NaN"), "snippet should show the offending content");
            }
            other => panic!("expected Decode error, got {other:?}"),
        }
    }

    #[test]
    fn decode_error_snippet_is_capped_at_100_chars() {
        let mut raw = b"not json at all ".to_vec();
        raw.extend(std::iter::repeat(b'x').take(500));

        let err = decode_document(&raw).expect_err("must fail");
        match err {
            RelayError::Decode { snippet, .. } => assert_eq!(snippet.chars().count(), 100),
            other => panic!("expected Decode error, got {other:?}"),
        }
    }

    #[test]
    fn decoded_document_round_trips() {
        let raw = br#"{"rows":[{"id":1,"score":0.5},{"id":2,"score":null}],"meta":{"count":2}}"#;
        let doc = decode_document(raw).expect("must decode");

        let reencoded = serde_json::to_vec(&doc).expect("must re-encode");
        let doc_again = decode_document(&reencoded).expect("must decode again");
        assert_eq!(doc, doc_again);
    }

    #[test]
    fn nan_inside_a_string_value_is_not_touched_when_valid() {
        // the substitution only fires on `: NaN,` with no quotes, so a quoted
        // "NaN" survives as data
        let doc = decode_document(br#"{"label":"NaN","a": NaN, "b":1}"#).expect("must decode");
        assert_eq!(doc["label"], json!("NaN"));
        assert_eq!(doc["a"], json!(null));
    }
}
