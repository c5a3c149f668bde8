use anyhow::{Context, Result, anyhow};
use bytes::Bytes;
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Full};
use hyper::{Response, StatusCode, header};
use serde::Serialize;
use serde::de::DeserializeOwned;
use shared::types::json_error::ErrorResponse;
use std::convert::Infallible;
use tracing::{debug, error, warn};

/// Helper function to create a full body from various types
pub fn full<T: Into<Bytes>>(chunk: T) -> BoxBody<Bytes, Infallible> {
    Full::new(chunk.into()).boxed()
}

/// Serialize any `Serialize` type and deliver it as a JSON response.
/// This is the primary helper all handlers should use instead of
/// writing their own one-off serialization + response-building blocks.
pub fn deliver_serialized_json<T: Serialize>(
    data: &T,
    status: StatusCode,
) -> Result<Response<BoxBody<Bytes, Infallible>>> {
    let json = serde_json::to_string(data).context("Failed to serialize response")?;

    debug!("Delivering serialized JSON response, size: {} bytes", json.len());

    let response = Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "application/json")
        .body(full(json))
        .map_err(|e| anyhow!("Failed to build JSON response: {}", e))?;

    Ok(response)
}

/// Delivers a JSON error response with the specified error code, message, and status.
pub fn deliver_error_json(
    error_code: &str,
    message: &str,
    status: StatusCode,
) -> Result<Response<BoxBody<Bytes, Infallible>>> {
    if status.is_server_error() {
        error!(
            "Delivering error JSON: {} - {} ({})",
            status.as_u16(),
            error_code,
            message
        );
    } else {
        warn!(
            "Delivering error JSON: {} - {} ({})",
            status.as_u16(),
            error_code,
            message
        );
    }

    deliver_serialized_json(&ErrorResponse::new(error_code, message), status)
}

/// Wrap `data` in the `{status: "success", data}` envelope.
pub fn deliver_success_json<T: Serialize>(
    data: &T,
    status: StatusCode,
) -> Result<Response<BoxBody<Bytes, Infallible>>> {
    deliver_serialized_json(
        &serde_json::json!({
            "status": "success",
            "data": data,
        }),
        status,
    )
}

/// Read the whole request body and parse it as JSON.
///
/// The outer `Result` is a transport failure; the inner one is a parse
/// failure the handler should answer with a 400.
pub async fn read_json_body<T: DeserializeOwned>(
    req: hyper::Request<hyper::body::Incoming>,
) -> Result<std::result::Result<T, serde_json::Error>> {
    let bytes = req
        .into_body()
        .collect()
        .await
        .context("Failed to read request body")?
        .to_bytes();
    Ok(serde_json::from_slice(&bytes))
}
