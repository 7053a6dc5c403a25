use crate::errors::RelayError;
use crate::types::{
    CallerContext, FunctionInvocationResult, InvocationPayload, InvocationRequest, ResponseBody,
};
use aws_sdk_lambda::error::DisplayErrorContext;
use aws_sdk_lambda::primitives::Blob;
use aws_sdk_lambda::types::{InvocationType, LogType};
use aws_sdk_lambda::Client as LambdaClient;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{info, warn};

/// Contains compiled regex for extracting the correlation token from the tail log.
static REQUEST_ID_REGEX: OnceLock<Regex> = OnceLock::new();

/// Fallback correlation token when the tail log yields nothing.
const UNKNOWN_REQUEST_ID: &str = "unknown";

/// Raw outcome of one synchronous invoke call, before interpretation.
#[derive(Debug)]
pub(crate) struct InvokeOutput {
    /// The function's response payload, if it produced one
    pub payload: Option<Vec<u8>>,
    /// Base64-encoded tail of the execution log
    pub tail_log: Option<String>,
    /// Set by the platform when the function errored instead of returning
    pub function_error: Option<String>,
}

/// Narrow view of the function invocation service: one payload in,
/// one raw outcome out.
pub(crate) trait FunctionInvoker {
    fn invoke(
        &self,
        payload: Vec<u8>,
    ) -> impl std::future::Future<Output = Result<InvokeOutput, RelayError>> + Send;
}

/// The live Lambda collaborator. The function name is fixed at construction.
/// The client is expected to carry a 30s operation timeout (see main.rs).
pub(crate) struct LambdaFunction {
    client: LambdaClient,
    function_name: String,
}

impl LambdaFunction {
    pub(crate) fn new(client: LambdaClient, function_name: String) -> Self {
        Self {
            client,
            function_name,
        }
    }
}

impl FunctionInvoker for LambdaFunction {
    /// Calls the function synchronously with tail-log capture.
    /// Transport failures (timeout, throttling, permissions) come back as
    /// [RelayError::Transport]; whatever the function itself did is in the output.
    async fn invoke(&self, payload: Vec<u8>) -> Result<InvokeOutput, RelayError> {
        let caller_context = CallerContext {
            source: "sync_relay",
            timestamp: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or_default(),
        };
        let caller_context = serde_json::to_vec(&caller_context)
            .map_err(|e| RelayError::Invocation(e.to_string()))?;

        let resp = self
            .client
            .invoke()
            .function_name(&self.function_name)
            .invocation_type(InvocationType::RequestResponse)
            .log_type(LogType::Tail)
            .payload(Blob::new(payload))
            .client_context(BASE64.encode(caller_context))
            .send()
            .await
            .map_err(|e| RelayError::Transport(DisplayErrorContext(&e).to_string()))?;

        Ok(InvokeOutput {
            payload: resp.payload().map(|b| b.as_ref().to_vec()),
            tail_log: resp.log_result().map(|s| s.to_string()),
            function_error: resp.function_error().map(|s| s.to_string()),
        })
    }
}

/// Relays the document to the remote function and interprets its structured
/// response. Never fails: every error at this stage is converted into a
/// failure result with status code 500.
pub(crate) async fn invoke_function<F: FunctionInvoker>(
    invoker: &F,
    document: &Value,
) -> FunctionInvocationResult {
    match try_invoke(invoker, document).await {
        Ok(result) => result,
        Err(e) => FunctionInvocationResult::failure(e.to_string(), None, 500),
    }
}

async fn try_invoke<F: FunctionInvoker>(
    invoker: &F,
    document: &Value,
) -> Result<FunctionInvocationResult, RelayError> {
    if is_empty_document(document) {
        return Err(RelayError::Invocation("Empty payload".to_string()));
    }

    // the function expects the document double-encoded: a JSON string under `body`
    let body = serde_json::to_string(document).map_err(|e| RelayError::Invocation(e.to_string()))?;
    let payload = serde_json::to_vec(&InvocationRequest { body })
        .map_err(|e| RelayError::Invocation(e.to_string()))?;

    let output = invoker.invoke(payload).await?;

    let payload: InvocationPayload = match &output.payload {
        Some(raw) => serde_json::from_slice(raw)
            .map_err(|e| RelayError::Invocation(format!("Invalid response payload: {e}")))?,
        None => return Err(RelayError::Invocation("Lambda execution failed".to_string())),
    };

    if output.function_error.is_some() {
        let message = payload
            .error_message
            .unwrap_or_else(|| "Lambda execution failed".to_string());
        return Err(RelayError::Invocation(message));
    }

    let request_id = extract_request_id(output.tail_log.as_deref());
    info!("Invocation completed, request id: {request_id}");

    // the response body is itself a JSON string; an absent or undecodable
    // body falls back to the generic messages below
    let response_body: ResponseBody = match payload.body.as_deref() {
        Some(raw) => serde_json::from_str(raw).unwrap_or_default(),
        None => ResponseBody::default(),
    };

    match payload.status_code {
        Some(200) => Ok(FunctionInvocationResult::success(
            response_body.message.unwrap_or_else(|| "Success".to_string()),
            response_body.data,
            request_id,
        )),
        status => Ok(FunctionInvocationResult::failure(
            response_body
                .error
                .unwrap_or_else(|| "Unknown error".to_string()),
            Some(request_id),
            status.unwrap_or(500),
        )),
    }
}

/// A document with nothing in it is not worth a network round-trip.
fn is_empty_document(document: &Value) -> bool {
    match document {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

/// Pulls the `RequestId: <token>` line out of the base64-encoded tail log.
/// A missing log, undecodable log, or missing token all yield "unknown",
/// never an error.
fn extract_request_id(tail_log: Option<&str>) -> String {
    let encoded = match tail_log {
        Some(v) => v,
        None => return UNKNOWN_REQUEST_ID.to_string(),
    };

    let decoded = match BASE64.decode(encoded) {
        Ok(v) => v,
        Err(e) => {
            warn!("Tail log is not valid base64: {}", e);
            return UNKNOWN_REQUEST_ID.to_string();
        }
    };
    let log = String::from_utf8_lossy(&decoded);

    let regex = REQUEST_ID_REGEX.get_or_init(|| {
        Regex::new(r"RequestId: ([^\s]+)").expect("Invalid request ID regex. It's a bug.")
    });

    regex
        .captures(&log)
        .and_then(|captures| captures.get(1))
        .map(|token| token.as_str().to_string())
        .unwrap_or_else(|| UNKNOWN_REQUEST_ID.to_string())
}
