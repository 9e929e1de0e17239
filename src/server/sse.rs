//! # Server-Sent Events
//!
//! Live sample delivery to browser clients over `GET /events`.
//!
//! Each subscriber gets its own forwarding task reading from the stream
//! sink's broadcast channel. Delivery is best-effort: a subscriber that
//! falls behind the channel capacity loses the oldest events and the stream
//! simply continues with newer ones.

use bytes::Bytes;
use hyper::header::{CACHE_CONTROL, CONNECTION, CONTENT_TYPE};
use hyper::{Body, Response, StatusCode};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use crate::sink::stream::{StreamSink, SAMPLE_EVENT};

/// Reconnect hint sent once per connection (milliseconds)
const RETRY_HINT: &str = "retry: 1000\n\n";

/// Format one SSE frame
///
/// # Arguments
///
/// * `name` - Event name
/// * `data` - Event payload (single line of JSON)
/// * `id` - Event id (wall-clock milliseconds)
pub fn event_frame(name: &str, data: &str, id: i64) -> String {
    format!("event: {}\ndata: {}\nid: {}\n\n", name, data, id)
}

/// Subscribe the requesting client to the live sample stream.
///
/// Spawns a forwarding task that lives until the client disconnects or the
/// stream sink is dropped.
pub fn subscribe(stream: &StreamSink) -> Response<Body> {
    let mut rx = stream.subscribe();
    let (mut sender, body) = Body::channel();

    tokio::spawn(async move {
        debug!("New SSE client");

        if sender.send_data(Bytes::from(RETRY_HINT)).await.is_err() {
            return;
        }

        loop {
            match rx.recv().await {
                Ok(payload) => {
                    let frame = event_frame(
                        SAMPLE_EVENT,
                        &payload,
                        chrono::Utc::now().timestamp_millis(),
                    );
                    if sender.send_data(Bytes::from(frame)).await.is_err() {
                        debug!("SSE client disconnected");
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("SSE client lagged, {} events dropped", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    let mut response = Response::new(body);
    *response.status_mut() = StatusCode::OK;
    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, hyper::header::HeaderValue::from_static("text/event-stream"));
    headers.insert(CACHE_CONTROL, hyper::header::HeaderValue::from_static("no-cache"));
    headers.insert(CONNECTION, hyper::header::HeaderValue::from_static("keep-alive"));
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::Sample;
    use hyper::body::HttpBody;

    #[test]
    fn test_event_frame_format() {
        let frame = event_frame("imuData", "{\"ypr\":[0,0,0]}", 12345);
        assert_eq!(frame, "event: imuData\ndata: {\"ypr\":[0,0,0]}\nid: 12345\n\n");
    }

    #[test]
    fn test_event_frame_ends_with_blank_line() {
        let frame = event_frame("x", "y", 0);
        assert!(frame.ends_with("\n\n"));
    }

    #[tokio::test]
    async fn test_subscribe_headers() {
        let stream = StreamSink::new(8);
        let response = subscribe(&stream);

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], "text/event-stream");
        assert_eq!(response.headers()[CACHE_CONTROL], "no-cache");
    }

    #[tokio::test]
    async fn test_subscriber_receives_published_samples() {
        let stream = StreamSink::new(8);
        let mut body = subscribe(&stream).into_body();

        // First chunk is the reconnect hint
        let first = body.data().await.unwrap().unwrap();
        assert_eq!(&first[..], RETRY_HINT.as_bytes());

        let sample = Sample {
            yaw: 1.0,
            ..Sample::default()
        };
        stream.publish(&sample);

        let chunk = body.data().await.unwrap().unwrap();
        let text = String::from_utf8(chunk.to_vec()).unwrap();
        assert!(text.starts_with("event: imuData\ndata: "));

        let payload = serde_json::to_string(&sample.to_json()).unwrap();
        assert!(text.contains(&payload));
    }

    #[tokio::test]
    async fn test_stream_ends_when_sink_dropped() {
        let stream = StreamSink::new(8);
        let mut body = subscribe(&stream).into_body();

        // Drain the reconnect hint, then drop the only sender
        let _ = body.data().await;
        drop(stream);

        assert!(body.data().await.is_none());
    }
}
