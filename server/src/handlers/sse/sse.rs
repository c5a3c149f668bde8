use std::convert::Infallible;
use std::sync::Arc;

use anyhow::{Context, Result};
use bytes::Bytes;
use http_body_util::{BodyExt, StreamBody, combinators::BoxBody};
use hyper::{Request, Response, StatusCode, body::Frame};
use shared::types::event::{OutgoingEvent, RealtimeEvent, TriggerRequest};
use shared::types::json_error::TriggerAck;
use shared::types::sse::encode_frame;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::broadcaster::broadcast_outgoing;
use super::registry::{EventSink, Registration};
use crate::AppState;
use crate::handlers::http::utils::json_response::deliver_serialized_json;

// ---------------------------------------------------------------------------
// Stream endpoint
// ---------------------------------------------------------------------------

/// Open a push channel to one dashboard client.
///
/// ### Event sequence emitted
/// ```text
/// data: {"type":"connected","data":{"clientId":"<uuid>"},...}
/// data: <every event broadcast while the connection stays open>
/// ```
///
/// The client is registered for exactly as long as hyper holds the response
/// body. Dropping the body (client navigated away, network drop, shutdown)
/// drops the `Registration` inside the stream, which deregisters it.
pub async fn handle_sse_subscribe(
    _req: Request<hyper::body::Incoming>,
    state: AppState,
) -> Result<Response<BoxBody<Bytes, Infallible>>> {
    let client_id = Uuid::new_v4().to_string();
    let (tx, mut rx) = mpsc::unbounded_channel::<Bytes>();

    // Queue the handshake before registering so it is always the first frame.
    let hello = encode_frame(&RealtimeEvent::connected(client_id.clone()))
        .context("Failed to encode connected event")?;
    tx.write(&hello)
        .context("Failed to queue connected event")?;

    let registration = Registration::new(state.registry.clone(), client_id.clone(), Arc::new(tx));
    info!("SSE connected: client={}", client_id);

    let stream = async_stream::stream! {
        let registration = registration;
        while let Some(frame) = rx.recv().await {
            yield Ok::<Frame<Bytes>, Infallible>(Frame::data(frame));
        }
        info!("SSE stream ended: client={}", registration.client_id());
    };

    Response::builder()
        .status(StatusCode::OK)
        .header("content-type", "text/event-stream")
        .header("cache-control", "no-cache")
        .header("connection", "keep-alive")
        .header("access-control-allow-origin", "*")
        .header("access-control-allow-headers", "Cache-Control")
        .header("x-accel-buffering", "no")
        .body(BodyExt::boxed(StreamBody::new(stream)))
        .context("Failed to build SSE response")
}

// ---------------------------------------------------------------------------
// Trigger endpoint
// ---------------------------------------------------------------------------

/// `POST {type, data}` → stamp, broadcast.
///
/// Only a body that is not JSON, or lacks a string `type`, gets a 400.
/// Event types the dashboard does not model, and payloads that do not fit
/// a modelled type, still go out as a stamped `{type, data, timestamp}`
/// frame. No authorization is performed here.
pub async fn handle_sse_trigger(
    req: Request<hyper::body::Incoming>,
    state: AppState,
) -> Result<Response<BoxBody<Bytes, Infallible>>> {
    let body = req
        .into_body()
        .collect()
        .await
        .context("Failed to read trigger body")?
        .to_bytes();

    let request = match serde_json::from_slice::<TriggerRequest>(&body) {
        Ok(request) => request,
        Err(e) => {
            warn!("Rejected trigger request: {}", e);
            return deliver_serialized_json(&TriggerAck::failed(), StatusCode::BAD_REQUEST);
        }
    };

    let event = request.into_outgoing();
    if matches!(event, OutgoingEvent::Untyped(_)) {
        debug!("Trigger passing {} through untyped", event.event_type());
    }
    info!("Trigger broadcasting {} event", event.event_type());
    broadcast_outgoing(&state.registry, &event);

    deliver_serialized_json(&TriggerAck::ok(), StatusCode::OK)
}
