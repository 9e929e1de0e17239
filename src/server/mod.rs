//! # HTTP Server Module
//!
//! The network request surface for the telemetry pipeline.
//!
//! This module handles:
//! - `POST /recordings/start` - begin a recording session
//! - `GET /recordings` - list recorded sessions
//! - `GET /recordings/<name>` - fetch a recording as incrementally
//!   materialized JSON (`?raw` for the binary file)
//! - `DELETE /recordings` - delete all recordings
//! - `GET /events` - live sample stream (server-sent events, see [`sse`])
//! - `GET /health` - liveness probe
//!
//! Fault taxonomy mapping: client input faults are 422, unknown recordings
//! 404, storage faults 500, encoding overflow 507.

pub mod sse;

use std::convert::Infallible;
use std::io::BufReader;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use hyper::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Method, Request, Response, StatusCode};
use serde::Deserialize;
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, error, info, warn};

use crate::error::ImuBridgeError;
use crate::materialize::JsonChunker;
use crate::router::SinkRouter;
use crate::sink::stream::StreamSink;
use crate::store::RecordStore;

/// Byte budget offered to the materializer for each body chunk
pub const CHUNK_BUDGET: usize = 1024;

/// Shared handles the request layer operates on.
///
/// Cloning is cheap; all clones refer to the same router, store and stream.
#[derive(Clone)]
pub struct AppState {
    /// The single process-wide sink router
    pub router: Arc<Mutex<SinkRouter>>,
    /// Recording store (read side)
    pub store: RecordStore,
    /// Live stream sink (subscription side)
    pub stream: StreamSink,
}

/// Handle returned by [`start`]; dropping it stops the server
pub struct ServerHandle {
    _shutdown_tx: oneshot::Sender<()>,
}

/// Start the HTTP server in a background task.
///
/// # Arguments
///
/// * `addr` - Address to bind
/// * `state` - Shared pipeline handles
///
/// # Errors
///
/// Returns an error if the address cannot be bound.
pub async fn start(addr: SocketAddr, state: AppState) -> hyper::Result<ServerHandle> {
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let make_service = make_service_fn(move |_conn| {
        let state = state.clone();
        async move {
            Ok::<_, Infallible>(service_fn(move |req| {
                let state = state.clone();
                async move { Ok::<_, Infallible>(handle_request(req, state).await) }
            }))
        }
    });

    let server = hyper::Server::try_bind(&addr)?
        .serve(make_service)
        .with_graceful_shutdown(async {
            let _ = shutdown_rx.await;
        });

    info!("Web server listening on http://{}", addr);

    tokio::spawn(async move {
        if let Err(e) = server.await {
            error!("Web server error: {}", e);
        }
    });

    Ok(ServerHandle {
        _shutdown_tx: shutdown_tx,
    })
}

/// Dispatch one request to its handler
pub(crate) async fn handle_request(req: Request<Body>, state: AppState) -> Response<Body> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    debug!("{} {}", method, path);

    match (method, path.as_str()) {
        (Method::POST, "/recordings/start") => start_recording(req, &state).await,

        (Method::GET, "/recordings") | (Method::GET, "/recordings/") => list_recordings(&state),

        (Method::DELETE, "/recordings") | (Method::DELETE, "/recordings/") => {
            clear_recordings(&state)
        }

        (Method::GET, "/events") => sse::subscribe(&state.stream),

        (Method::GET, "/health") => text_response(StatusCode::OK, "OK"),

        (Method::GET, path) if path.starts_with("/recordings/") => {
            let name = &path["/recordings/".len()..];
            if wants_raw(req.uri().query()) {
                fetch_raw(name, &state)
            } else {
                fetch_decoded(name, &state)
            }
        }

        _ => text_response(StatusCode::NOT_FOUND, "Not Found"),
    }
}

/// Body of a start-recording request
#[derive(Debug, Deserialize)]
struct StartRequest {
    /// Recording length in milliseconds
    time: Option<u64>,
    /// Recording name; defaults to the current timestamp
    name: Option<String>,
}

async fn start_recording(req: Request<Body>, state: &AppState) -> Response<Body> {
    let body = match hyper::body::to_bytes(req.into_body()).await {
        Ok(body) => body,
        Err(e) => {
            return text_response(
                StatusCode::UNPROCESSABLE_ENTITY,
                &format!("Could not read request body: {}", e),
            )
        }
    };

    let request: StartRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            return text_response(
                StatusCode::UNPROCESSABLE_ENTITY,
                &format!("Malformed JSON body: {}", e),
            )
        }
    };

    let millis = match request.time {
        Some(millis) if millis > 0 => millis,
        _ => {
            return text_response(
                StatusCode::UNPROCESSABLE_ENTITY,
                "JSON \"time\" key missing or zero",
            )
        }
    };

    let result = state
        .router
        .lock()
        .await
        .start_recording(Duration::from_millis(millis), request.name);

    match result {
        Ok(name) => {
            info!("Recording {} started via request ({} ms)", name, millis);
            text_response(StatusCode::OK, "Recording started")
        }
        Err(e) => error_response(e),
    }
}

fn list_recordings(state: &AppState) -> Response<Body> {
    let names = match state.store.list() {
        Ok(names) => names,
        Err(e) => return error_response(e),
    };

    let files: Vec<String> = names.collect();
    match serde_json::to_vec(&serde_json::json!({ "files": files })) {
        Ok(body) => json_response(StatusCode::OK, body),
        Err(e) => error_response(e.into()),
    }
}

/// Stream a recording through the chunked materializer.
///
/// The response body is fed [`CHUNK_BUDGET`]-byte chunks at a time, so only
/// one record is ever decoded in memory no matter how large the file is. If
/// the client disconnects mid-transfer the feeding task ends and the file
/// handle is dropped.
fn fetch_decoded(name: &str, state: &AppState) -> Response<Body> {
    let file = match state.store.open_for_read(name) {
        Ok(file) => file,
        Err(e) => return error_response(e),
    };

    let (mut sender, body) = Body::channel();
    let name = name.to_string();

    tokio::spawn(async move {
        let mut chunker = JsonChunker::new(BufReader::new(file));
        let mut buf = [0u8; CHUNK_BUDGET];

        loop {
            match chunker.next_chunk(&mut buf) {
                Ok(0) => {
                    debug!(
                        "Materialized {} ({} records)",
                        name,
                        chunker.records_emitted()
                    );
                    break;
                }
                Ok(n) => {
                    if sender.send_data(Bytes::copy_from_slice(&buf[..n])).await.is_err() {
                        debug!("Client disconnected while fetching {}", name);
                        break;
                    }
                }
                Err(e) => {
                    error!("Materializing {} failed: {}", name, e);
                    sender.abort();
                    break;
                }
            }
        }
    });

    match Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, "application/json")
        .body(body)
    {
        Ok(response) => response,
        Err(e) => {
            error!("Could not build response: {}", e);
            text_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal error")
        }
    }
}

fn fetch_raw(name: &str, state: &AppState) -> Response<Body> {
    let bytes = match state.store.read_raw(name) {
        Ok(bytes) => bytes,
        Err(e) => return error_response(e),
    };

    match Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, "application/octet-stream")
        .header(
            CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", name),
        )
        .body(Body::from(bytes))
    {
        Ok(response) => response,
        Err(e) => {
            error!("Could not build response: {}", e);
            text_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal error")
        }
    }
}

fn clear_recordings(state: &AppState) -> Response<Body> {
    let cleared = state.store.clear_all();
    match serde_json::to_vec(&serde_json::json!({ "cleared": cleared })) {
        Ok(body) => json_response(StatusCode::OK, body),
        Err(e) => error_response(e.into()),
    }
}

/// Whether the query string requests the raw binary file
fn wants_raw(query: Option<&str>) -> bool {
    query.map_or(false, |q| {
        q.split('&').any(|p| p == "raw" || p.starts_with("raw="))
    })
}

/// Map a pipeline error onto the fault taxonomy's status codes
fn error_response(err: ImuBridgeError) -> Response<Body> {
    let status = match &err {
        ImuBridgeError::InvalidRequest(_) => StatusCode::UNPROCESSABLE_ENTITY,
        ImuBridgeError::NotFound(_) => StatusCode::NOT_FOUND,
        ImuBridgeError::Encoding(_) => StatusCode::INSUFFICIENT_STORAGE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if status.is_server_error() {
        warn!("Request failed: {}", err);
    }
    text_response(status, &err.to_string())
}

fn text_response(status: StatusCode, message: &str) -> Response<Body> {
    let mut response = Response::new(Body::from(message.to_string()));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, hyper::header::HeaderValue::from_static("text/plain"));
    response
}

fn json_response(status: StatusCode, body: Vec<u8>) -> Response<Body> {
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, hyper::header::HeaderValue::from_static("application/json"));
    response
}
