pub(crate) mod relay;

use http_body_util::{combinators::BoxBody, BodyExt, Empty, Full};
use hyper::body::Bytes;
use hyper::Response;
use serde::Serialize;

// We create some utility functions to make Empty and Full bodies
// fit our broadened Response body type.
pub(crate) fn empty() -> BoxBody<Bytes, hyper::Error> {
    Empty::<Bytes>::new().map_err(|never| match never {}).boxed()
}

pub(crate) fn full<T: Into<Bytes>>(chunk: T) -> BoxBody<Bytes, hyper::Error> {
    Full::new(chunk.into()).map_err(|never| match never {}).boxed()
}

/// Wraps a serializable value into a 200 JSON response. The relay always
/// answers 200 at the HTTP level; failures are expressed in the body.
pub(crate) fn json_response<T: Serialize>(value: &T) -> Response<BoxBody<Bytes, hyper::Error>> {
    let body = serde_json::to_vec(value).expect("Response shapes always serialize. It's a bug.");

    Response::builder()
        .status(hyper::StatusCode::OK)
        .header(hyper::header::CONTENT_TYPE, "application/json")
        .body(full(body))
        .expect("Failed to create a response")
}
