use super::json_response;
use crate::errors::RelayError;
use crate::lambda::{invoke_function, FunctionInvoker};
use crate::s3::{fetch_document, ObjectStore};
use crate::types::IncomingRequest;
use http_body_util::combinators::BoxBody;
use hyper::body::Bytes;
use hyper::Response;
use serde_json::json;
use tracing::{info, warn};

/// Handles one relay request end to end: parse the body for an object key,
/// fetch and decode the document, pass it to the function, return whichever
/// result came out. The two stages are strictly sequential and the second
/// never starts if the first failed.
pub(crate) async fn handler<S, F>(
    body: Bytes,
    store: &S,
    invoker: &F,
) -> Response<BoxBody<Bytes, hyper::Error>>
where
    S: ObjectStore,
    F: FunctionInvoker,
{
    let s3_path = match parse_s3_path(&body) {
        Ok(v) => v,
        Err(e) => {
            warn!("Request body had no usable s3_path");
            return stage_error(&e);
        }
    };

    info!("Relaying document at {s3_path}");

    let document = match fetch_document(store, &s3_path).await {
        Ok(v) => v,
        Err(e) => {
            warn!("Fetch stage failed: {e}");
            return stage_error(&e);
        }
    };

    let result = invoke_function(invoker, &document).await;
    json_response(&result)
}

/// An undecodable body and a body without the field are treated the same,
/// and an empty path is as useless as a missing one.
fn parse_s3_path(body: &[u8]) -> Result<String, RelayError> {
    serde_json::from_slice::<IncomingRequest>(body)
        .ok()
        .and_then(|req| req.s3_path)
        .filter(|path| !path.is_empty())
        .ok_or(RelayError::MissingPath)
}

/// Fetch-stage failures are reported with a `status` field, unlike
/// invocation results which carry `success`.
fn stage_error(e: &RelayError) -> Response<BoxBody<Bytes, hyper::Error>> {
    json_response(&json!({
        "status": "error",
        "message": e.to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lambda::InvokeOutput;
    use http_body_util::BodyExt;
    use serde_json::{json, Value};

    struct FakeStore {
        outcome: Result<Vec<u8>, RelayError>,
    }

    impl ObjectStore for FakeStore {
        async fn fetch(&self, _key: &str) -> Result<Vec<u8>, RelayError> {
            match &self.outcome {
                Ok(raw) => Ok(raw.clone()),
                Err(RelayError::Storage(msg)) => Err(RelayError::Storage(msg.clone())),
                Err(other) => panic!("unsupported fake outcome: {other:?}"),
            }
        }
    }

    struct UnreachableStore;

    impl ObjectStore for UnreachableStore {
        async fn fetch(&self, _key: &str) -> Result<Vec<u8>, RelayError> {
            panic!("fetch must not be called");
        }
    }

    struct FakeInvoker {
        output: InvokeOutput,
    }

    impl FunctionInvoker for FakeInvoker {
        async fn invoke(&self, _payload: Vec<u8>) -> Result<InvokeOutput, RelayError> {
            Ok(InvokeOutput {
                payload: self.output.payload.clone(),
                tail_log: self.output.tail_log.clone(),
                function_error: self.output.function_error.clone(),
            })
        }
    }

    struct UnreachableInvoker;

    impl FunctionInvoker for UnreachableInvoker {
        async fn invoke(&self, _payload: Vec<u8>) -> Result<InvokeOutput, RelayError> {
            panic!("invoke must not be called");
        }
    }

    fn ok_invoker(status_code: i64, body: Value) -> FakeInvoker {
        FakeInvoker {
            output: InvokeOutput {
                payload: Some(
                    json!({"statusCode": status_code, "body": body.to_string()})
                        .to_string()
                        .into_bytes(),
                ),
                tail_log: None,
                function_error: None,
            },
        }
    }

    async fn body_json(resp: Response<BoxBody<Bytes, hyper::Error>>) -> Value {
        assert_eq!(
            resp.headers()
                .get(hyper::header::CONTENT_TYPE)
                .expect("content type must be set"),
            "application/json"
        );
        let bytes = resp
            .into_body()
            .collect()
            .await
            .expect("body must be readable")
            .to_bytes();
        serde_json::from_slice(&bytes).expect("body must be JSON")
    }

    #[tokio::test]
    async fn missing_s3_path_short_circuits_before_any_network_call() {
        for body in [
            Bytes::from_static(b"{}"),
            Bytes::from_static(br#"{"path":"a/b.json"}"#),
            Bytes::from_static(br#"{"s3_path":""}"#),
            Bytes::from_static(br#"{"s3_path":null}"#),
            Bytes::from_static(b"not json"),
            Bytes::new(),
        ] {
            let resp = handler(body.clone(), &UnreachableStore, &UnreachableInvoker).await;
            assert_eq!(
                body_json(resp).await,
                json!({"status": "error", "message": "Missing s3_path parameter"}),
                "body {body:?} must short-circuit"
            );
        }
    }

    #[tokio::test]
    async fn storage_failure_is_relayed_and_stops_the_pipeline() {
        let store = FakeStore {
            outcome: Err(RelayError::Storage("NoSuchKey: the key does not exist".to_string())),
        };

        let resp = handler(
            Bytes::from_static(br#"{"s3_path":"missing.json"}"#),
            &store,
            &UnreachableInvoker,
        )
        .await;

        assert_eq!(
            body_json(resp).await,
            json!({
                "status": "error",
                "message": "AWS Error: NoSuchKey: the key does not exist"
            })
        );
    }

    #[tokio::test]
    async fn decode_failure_is_relayed_with_the_content_snippet() {
        let store = FakeStore {
            outcome: Ok(b"<html>not json</html>".to_vec()),
        };

        let resp = handler(
            Bytes::from_static(br#"{"s3_path":"broken.json"}"#),
            &store,
            &UnreachableInvoker,
        )
        .await;

        let body = body_json(resp).await;
        assert_eq!(body["status"], json!("error"));
        let message = body["message"].as_str().expect("message must be a string");
        assert!(message.starts_with("JSON Error: "));
        assert!(message.contains("First 100 chars of content: <html>"));
    }

    #[tokio::test]
    async fn fetched_document_flows_through_to_a_success_response() {
        let store = FakeStore {
            outcome: Ok(br#"{"metric": NaN, "count": 7}"#.to_vec()),
        };
        let invoker = ok_invoker(200, json!({"message": "stored", "data": {"id": 42}}));

        let resp = handler(Bytes::from_static(br#"{"s3_path":"batch/7.json"}"#), &store, &invoker).await;

        assert_eq!(
            body_json(resp).await,
            json!({
                "success": true,
                "message": "stored",
                "data": {"id": 42},
                "request_id": "unknown",
                "status_code": 200
            })
        );
    }

    #[tokio::test]
    async fn empty_fetched_document_yields_the_empty_payload_failure() {
        let store = FakeStore {
            outcome: Ok(b"{}".to_vec()),
        };

        let resp = handler(
            Bytes::from_static(br#"{"s3_path":"empty.json"}"#),
            &store,
            &UnreachableInvoker,
        )
        .await;

        assert_eq!(
            body_json(resp).await,
            json!({
                "success": false,
                "message": "Empty payload",
                "data": null,
                "request_id": null,
                "status_code": 500
            })
        );
    }

    #[tokio::test]
    async fn remote_failure_status_is_relayed_verbatim() {
        let store = FakeStore {
            outcome: Ok(br#"{"rows": [1, 2]}"#.to_vec()),
        };
        let invoker = ok_invoker(422, json!({"error": "schema mismatch"}));

        let resp = handler(Bytes::from_static(br#"{"s3_path":"rows.json"}"#), &store, &invoker).await;

        assert_eq!(
            body_json(resp).await,
            json!({
                "success": false,
                "message": "schema mismatch",
                "data": null,
                "request_id": "unknown",
                "status_code": 422
            })
        );
    }
}
