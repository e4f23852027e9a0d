//! The HTTP server, handler and routes.
//!
//! This file itself contains fairly little business logic and just sets up the
//! `hyper` server and catches errors. The main logic is in `handlers.rs`.

use bytes::Bytes;
use futures::FutureExt;
use http_body_util::Full;
use hyper::service::service_fn;
use hyper_util::{
    rt::{TokioExecutor, TokioIo},
    server::{conn::auto, graceful::GracefulShutdown},
};
use std::{
    convert::Infallible,
    future::Future,
    net::{IpAddr, SocketAddr},
    panic::AssertUnwindSafe,
    sync::Arc,
    time::Duration,
};
use tokio::net::TcpListener;

use crate::{api, config::{ApiConfig, Config}, prelude::*};
use self::handlers::handle;


mod handlers;
mod log;
mod response;


/// HTTP server configuration.
#[derive(Debug, Clone, confique::Config)]
pub(crate) struct HttpConfig {
    /// The TCP port the HTTP server should listen on.
    #[config(default = 8080)]
    pub(crate) port: u16,

    /// The bind address to listen on.
    #[config(default = "127.0.0.1")]
    pub(crate) address: IpAddr,

    /// Maximum size of a request body in bytes. Requests to the API with a
    /// larger body are rejected with "400 Bad Request".
    #[config(default = 1048576, validate = validate_max_body_size)]
    pub(crate) max_body_size: usize,

    /// How long to wait for open connections to finish after a shutdown
    /// signal (Ctrl+C) was received.
    #[config(default = "5s", deserialize_with = crate::config::deserialize_duration)]
    pub(crate) graceful_shutdown_timeout: Duration,
}

fn validate_max_body_size(size: &usize) -> Result<(), String> {
    if *size == 0 {
        return Err("'http.max_body_size' must be larger than 0".into());
    }
    Ok(())
}


// Our responses always carry their whole body at once.
type Body = Full<Bytes>;
type Response = hyper::Response<Body>;


/// Context that the request handler has access to.
struct Context {
    api_root: Arc<api::RootNode>,
    api_config: Arc<ApiConfig>,
    max_body_size: usize,
    log_http_headers: bool,
}


/// Starts the HTTP server and runs it until a shutdown signal is received.
pub(crate) async fn serve(config: Config, api_root: api::RootNode) -> Result<()> {
    let http_config = config.http;
    let ctx = Arc::new(Context {
        api_root: Arc::new(api_root),
        api_config: Arc::new(config.api),
        max_body_size: http_config.max_body_size,
        log_http_headers: config.log.log_http_headers,
    });

    let addr = SocketAddr::new(http_config.address, http_config.port);
    let listener = TcpListener::bind(addr).await
        .with_context(|| format!("failed to bind to {addr}"))?;
    info!("Listening on http://{}", listener.local_addr()?);

    // Each accepted connection is served in its own task. All of them share
    // the same context, which is only ever read.
    let builder = auto::Builder::new(TokioExecutor::new());
    let graceful = GracefulShutdown::new();
    let mut shutdown = std::pin::pin!(shutdown_signal());

    loop {
        let stream = tokio::select! {
            res = listener.accept() => match res {
                Ok((stream, peer)) => {
                    trace!("Accepted connection from {peer}");
                    stream
                }
                Err(e) => {
                    warn!("Failed to accept connection: {e}");
                    continue;
                }
            },
            () = &mut shutdown => break,
        };

        let ctx = Arc::clone(&ctx);
        let service = service_fn(move |req| {
            handle_internal_errors(handle(req, Arc::clone(&ctx)))
        });
        let conn = builder.serve_connection_with_upgrades(TokioIo::new(stream), service);
        let conn = graceful.watch(conn.into_owned());
        tokio::spawn(async move {
            if let Err(e) = conn.await {
                debug!("Error serving HTTP connection: {e}");
            }
        });
    }

    drop(listener);
    let timeout = http_config.graceful_shutdown_timeout;
    info!("Shutting down, waiting up to {timeout:.2?} for open connections...");
    tokio::select! {
        () = graceful.shutdown() => info!("All connections closed"),
        () = tokio::time::sleep(timeout) => {
            warn!("Timed out waiting for open connections to close");
        }
    }

    Ok(())
}

/// Resolves once Ctrl+C is received.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        // Without a signal handler, we just keep running until killed.
        error!("Failed to install Ctrl+C handler: {e}");
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal");
}

/// This just wraps another future and catches all panics that might occur when
/// resolving/polling that given future. This ensures that we always answer with
/// `500` instead of just closing the connection.
async fn handle_internal_errors(
    future: impl Future<Output = Response>,
) -> Result<Response, Infallible> {
    // Hyper catches panics for us anyway, so this changes nothing except that
    // our response is better.
    match AssertUnwindSafe(future).catch_unwind().await {
        Ok(response) => Ok(response),
        Err(panic) => {
            // For most panics (which use `panic!` like `println!`), the payload
            // is either `&str` or `String`.
            let msg = panic.downcast_ref::<String>()
                .map(|s| s.as_str())
                .or(panic.downcast_ref::<&str>().copied());

            match msg {
                Some(msg) => error!("INTERNAL SERVER ERROR: HTTP handler panicked: '{}'", msg),
                None => error!("INTERNAL SERVER ERROR: HTTP handler panicked"),
            }

            Ok(response::internal_server_error())
        }
    }
}
