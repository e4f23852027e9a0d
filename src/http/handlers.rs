use bytes::Bytes;
use http_body_util::{BodyExt, Limited, LengthLimitError};
use hyper::{Method, Request};
use std::{sync::Arc, time::Instant};

use crate::{api, prelude::*};
use super::{Context, Response, log, response};


/// Errors of request bodies we might read, boxed by `http-body-util`.
type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// This is the main HTTP entry point, called for each incoming request.
pub(super) async fn handle<B>(req: Request<B>, ctx: Arc<Context>) -> Response
where
    B: hyper::body::Body<Data = Bytes>,
    B::Error: Into<BoxError>,
{
    log::req::log(&req);
    if ctx.log_http_headers {
        log::headers::log(&req);
    }

    let path = req.uri().path().trim_end_matches('/');
    match path {
        "/api" => handle_api(req, &ctx).await,

        _ => {
            debug!("Responding with 404 to {:?} '{}'", req.method(), path);
            response::not_found()
        }
    }
}

/// Handles a request to `/api`. The query engine is only invoked if the query
/// document could be extracted from the request. Errors of the query itself
/// are part of the JSON response, which is always sent with status 200.
async fn handle_api<B>(req: Request<B>, ctx: &Context) -> Response
where
    B: hyper::body::Body<Data = Bytes>,
    B::Error: Into<BoxError>,
{
    let before = Instant::now();
    let method = req.method().clone();

    let query = match read_query(req, ctx.max_body_size).await {
        Ok(query) => query,
        Err(e) => {
            log::query::rejected(&method, &e);
            return response::bad_request(&format!("{e:#}"));
        }
    };
    log::query::received(&method, &query);

    let api_context = api::Context { config: Arc::clone(&ctx.api_config) };
    let out = api::execute(&ctx.api_root, &api_context, &query).await;

    let body = match serde_json::to_vec(&out) {
        Ok(body) => body,
        Err(e) => {
            error!("Failed to serialize GraphQL response: {e}");
            return response::internal_server_error();
        }
    };

    log::query::finished(before.elapsed(), out.is_ok());

    response::json(body)
}

/// Extracts the query document: from the `query` parameter for GET requests,
/// from the full body for all other methods. A missing parameter results in
/// an empty document.
async fn read_query<B>(req: Request<B>, limit: usize) -> Result<String>
where
    B: hyper::body::Body<Data = Bytes>,
    B::Error: Into<BoxError>,
{
    if req.method() == Method::GET {
        let query = req.uri().query()
            .and_then(|q| form_urlencoded::parse(q.as_bytes()).find(|(key, _)| key == "query"))
            .map(|(_, value)| value.into_owned())
            .unwrap_or_default();
        return Ok(query);
    }

    let body = Limited::new(req.into_body(), limit)
        .collect()
        .await
        .map_err(|e| {
            if e.downcast_ref::<LengthLimitError>().is_some() {
                anyhow!("request body is larger than {limit} bytes")
            } else {
                anyhow!("failed to read request body: {e}")
            }
        })?
        .to_bytes();

    String::from_utf8(body.to_vec()).context("request body is not valid UTF-8")
}
