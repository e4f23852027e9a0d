use bytes::Bytes;
use hyper::{StatusCode, header};

use super::{Body, Response};


pub(crate) fn json(body: Vec<u8>) -> Response {
    hyper::Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::new(Bytes::from(body)))
        .expect("bug: invalid response")
}

pub(crate) fn bad_request(msg: &str) -> Response {
    plain_text(StatusCode::BAD_REQUEST, format!("Bad request: {msg}"))
}

pub(crate) fn not_found() -> Response {
    plain_text(StatusCode::NOT_FOUND, "404 Not found".into())
}

pub(crate) fn internal_server_error() -> Response {
    plain_text(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".into())
}

fn plain_text(status: StatusCode, body: String) -> Response {
    hyper::Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "text/plain; charset=UTF-8")
        .body(Body::new(Bytes::from(body)))
        .expect("bug: invalid response")
}
