//! Blocking HTTP front end.
//!
//! `tiny_http` accepts connections on one thread and hands each request to
//! a rayon pool. All request work (routing, file reads, image rendering) is
//! synchronous, so concurrency comes from worker threads only.
//!
//! A panic while handling a request is caught and answered with a plain
//! 500; the pool's panic handler logs anything that escapes a job, so one
//! bad request never takes the listener down.
//!
//! HEAD requests go through the same pipeline; `tiny_http` sends the
//! headers (including the full `Content-Length`) and drops the body.

use crate::blog::{Blog, RequestInfo};
use crate::config::effective_threads;
use crate::imaging::ImageBackend;
use crate::response::Response;
use std::any::Any;
use std::io::Cursor;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tiny_http::{Header, Request, Server, StatusCode};

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Failed to bind {addr}: {message}")]
    Bind { addr: String, message: String },
    #[error("Failed to start worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

/// Bind the configured address and serve until the listener shuts down.
pub fn serve<B>(blog: Blog<B>) -> Result<(), ServerError>
where
    B: ImageBackend + Send + 'static,
{
    let server_config = blog.config().server.clone();
    let addr = format!("{}:{}", server_config.host, server_config.port);
    let server = Server::http(&addr).map_err(|e| ServerError::Bind {
        addr: addr.clone(),
        message: e.to_string(),
    })?;

    let threads = effective_threads(&server_config);
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|i| format!("http-worker-{i}"))
        .panic_handler(|payload| {
            tracing::error!("worker panicked: {}", panic_message(payload.as_ref()));
        })
        .build()?;

    tracing::info!(
        "listening on {}://{addr} ({threads} workers)",
        server_config.scheme()
    );

    let blog = Arc::new(blog);
    let fallback_host = Arc::new(addr);
    for request in server.incoming_requests() {
        let blog = Arc::clone(&blog);
        let fallback_host = Arc::clone(&fallback_host);
        pool.spawn(move || {
            if let Err(e) = handle_request(request, &blog, &fallback_host) {
                tracing::warn!("failed to send response: {e}");
            }
        });
    }
    Ok(())
}

fn handle_request<B: ImageBackend>(
    request: Request,
    blog: &Blog<B>,
    fallback_host: &str,
) -> std::io::Result<()> {
    let started = Instant::now();
    let host = request
        .headers()
        .iter()
        .find(|h| h.field.equiv("Host"))
        .map(|h| h.value.as_str().to_string());
    let info = request_info(request.url(), host.as_deref(), fallback_host);

    let response = handle_guarded(blog, &info);
    tracing::info!(
        method = %request.method(),
        path = %info.path,
        status = response.status_code,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "request"
    );
    request.respond(into_wire(response))
}

/// Run the pipeline, turning a panic into a plain 500.
fn handle_guarded<B: ImageBackend>(blog: &Blog<B>, info: &RequestInfo) -> Response {
    match panic::catch_unwind(AssertUnwindSafe(|| blog.handle(info))) {
        Ok(response) => response,
        Err(payload) => {
            tracing::error!(
                path = %info.path,
                "request panicked: {}",
                panic_message(payload.as_ref())
            );
            Response::build(
                Some(500),
                b"Internal Server Error".to_vec(),
                vec![(
                    "Content-Type".to_string(),
                    "text/plain; charset=utf-8".to_string(),
                )],
            )
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

/// Build the routing input from a raw request target. Query string and
/// fragment are dropped; a missing `Host` header falls back to the bound
/// address.
fn request_info(url: &str, host: Option<&str>, fallback_host: &str) -> RequestInfo {
    let path = url.split(['?', '#']).next().unwrap_or_default();
    let path = if path.is_empty() { "/" } else { path };
    let host = host
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .unwrap_or(fallback_host);
    RequestInfo::new(path, host)
}

/// Copy a [`Response`] onto a `tiny_http` response. `Content-Length` comes
/// from the body length, not the header list.
fn into_wire(response: Response) -> tiny_http::Response<Cursor<Vec<u8>>> {
    let length = response.body.len();
    let mut wire = tiny_http::Response::new(
        StatusCode(response.status_code),
        Vec::new(),
        Cursor::new(response.body),
        Some(length),
        None,
    );
    for (name, value) in &response.headers {
        if name.eq_ignore_ascii_case("Content-Length") {
            continue;
        }
        match Header::from_bytes(name.as_bytes(), value.as_bytes()) {
            Ok(header) => wire.add_header(header),
            Err(()) => tracing::warn!(header = %name, "dropping invalid response header"),
        }
    }
    wire
}
