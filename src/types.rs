use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The inbound POST body. Only one field matters; anything else is ignored.
#[derive(Debug, Deserialize)]
pub(crate) struct IncomingRequest {
    #[serde(default)]
    pub s3_path: Option<String>,
}

/// The only externally observable output shape for the invocation stage,
/// success or failure. Serialized verbatim as the HTTP response body.
#[derive(Debug, Serialize, PartialEq)]
pub(crate) struct FunctionInvocationResult {
    pub success: bool,
    pub message: String,
    pub data: Option<Value>,
    /// Correlation token from the tail log. "unknown" when the log had no
    /// RequestId line, None when the invocation never produced a log.
    pub request_id: Option<String>,
    pub status_code: i64,
}

impl FunctionInvocationResult {
    pub(crate) fn success(message: String, data: Option<Value>, request_id: String) -> Self {
        Self {
            success: true,
            message,
            data,
            request_id: Some(request_id),
            status_code: 200,
        }
    }

    pub(crate) fn failure(message: String, request_id: Option<String>, status_code: i64) -> Self {
        Self {
            success: false,
            message,
            data: None,
            request_id,
            status_code,
        }
    }
}

/// Envelope sent to the function: the document re-encoded as a JSON string
/// under `body`, per the proxy-integration invocation contract.
#[derive(Debug, Serialize)]
pub(crate) struct InvocationRequest {
    pub body: String,
}

/// Caller metadata passed as the base64-encoded client context.
#[derive(Debug, Serialize)]
pub(crate) struct CallerContext {
    pub source: &'static str,
    pub timestamp: u64,
}

/// Outer shape of the function's response payload.
#[derive(Debug, Deserialize)]
pub(crate) struct InvocationPayload {
    #[serde(rename = "statusCode")]
    pub status_code: Option<i64>,
    /// Itself a JSON string, decoded separately into [ResponseBody].
    pub body: Option<String>,
    #[serde(rename = "errorMessage")]
    pub error_message: Option<String>,
}

/// The decoded `body` field of the function's response payload.
#[derive(Debug, Deserialize, Default)]
pub(crate) struct ResponseBody {
    pub message: Option<String>,
    pub data: Option<Value>,
    pub error: Option<String>,
}
