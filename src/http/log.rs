//! Small inline modules for everything we log about HTTP requests, so that
//! each kind of message can be enabled separately via `log.filters`, e.g.
//! `"graphql_layers::http::log::query" = "trace"`.

use hyper::{Method, Request, header};
use crate::prelude::*;

pub mod req {
    use super::*;

    /// Logs the request line. The query string is not logged here as for GET
    /// requests it contains the whole query document (see `query::received`).
    pub fn log<B>(req: &Request<B>) {
        trace!(
            method = %req.method(),
            path = %req.uri().path(),
            has_query_string = req.uri().query().is_some(),
            content_length = %req.headers().get(header::CONTENT_LENGTH)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("-"),
            "Incoming HTTP request",
        );
    }
}

pub mod headers {
    use super::*;

    pub fn log<B>(req: &Request<B>) {
        for (name, value) in req.headers() {
            trace!(
                header = %name,
                value = %String::from_utf8_lossy(value.as_bytes()),
                "HTTP header",
            );
        }
    }
}

pub mod query {
    use super::*;

    /// Logs a query document that was extracted from a request and is about
    /// to be executed. The document itself is only logged at trace level.
    pub fn received(method: &Method, query: &str) {
        let source = if *method == Method::GET { "query parameter" } else { "body" };
        debug!(method = %method, source = %source, query_len = query.len(), "Executing API query");
        trace!("API query document: {query}");
    }

    pub fn rejected(method: &Method, reason: &anyhow::Error) {
        debug!(method = %method, "Rejecting API request: {reason:#}");
    }

    pub fn finished(elapsed: std::time::Duration, ok: bool) {
        debug!(
            "Finished API query in {:.2?} ({})",
            elapsed,
            if ok { "ok" } else { "with errors" },
        );
    }
}
