use anyhow::Context as _;
use bytes::Bytes;
use http::header::{CONTENT_TYPE, HOST};
use http::{Method, StatusCode, Uri, request};
use http_body_util::{BodyExt, Full};
use hyper::client::conn::http1::{self, Connection, SendRequest};
use hyper_util::rt::TokioIo;
use serde_json::Value;
use thiserror::Error;
use tokio::net::TcpStream;
use tracing::debug;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Invalid server URL: {0}")]
    InvalidUrl(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Hyper(#[from] hyper::Error),

    #[error("Failed to build request: {0}")]
    Request(#[from] http::Error),

    #[error("Unexpected response status: {0}")]
    Status(StatusCode),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type ClientConnection = Connection<TokioIo<TcpStream>, Full<Bytes>>;

// ---------------------------------------------------------------------------
// ApiClient
// ---------------------------------------------------------------------------

/// Minimal HTTP/1 client for the dashboard API. Every call opens its own
/// connection; the realtime stream keeps its connection for its lifetime.
#[derive(Clone, Debug)]
pub struct ApiClient {
    host: String,
    port: u16,
    authority: String,
    base_path: String,
}

impl ApiClient {
    /// Accepts `http://host[:port][/prefix]`.
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let invalid = || ClientError::InvalidUrl(base_url.to_string());

        let uri: Uri = base_url.trim().parse().map_err(|_| invalid())?;
        if uri.scheme_str() != Some("http") {
            return Err(invalid());
        }
        let authority = uri.authority().ok_or_else(invalid)?;

        Ok(Self {
            host: authority
                .host()
                .trim_start_matches('[')
                .trim_end_matches(']')
                .to_string(),
            port: authority.port_u16().unwrap_or(80),
            authority: authority.as_str().to_string(),
            base_path: uri.path().trim_end_matches('/').to_string(),
        })
    }

    pub fn authority(&self) -> &str {
        &self.authority
    }

    fn url_path(&self, path: &str) -> String {
        format!("{}{}", self.base_path, path)
    }

    /// Request builder with the path resolved against the base URL.
    pub fn request(&self, method: Method, path: &str) -> request::Builder {
        http::Request::builder()
            .method(method)
            .uri(self.url_path(path))
            .header(HOST, self.authority.as_str())
    }

    /// Open a TCP connection and run the HTTP/1 handshake. The returned
    /// connection future must be polled for the sender to make progress.
    pub async fn handshake(
        &self,
    ) -> Result<(SendRequest<Full<Bytes>>, ClientConnection), ClientError> {
        let stream = TcpStream::connect((self.host.as_str(), self.port)).await?;
        let (sender, conn) = http1::handshake(TokioIo::new(stream)).await?;
        Ok((sender, conn))
    }

    /// Send one request and parse the JSON response. Non-2xx statuses are
    /// returned, not treated as errors; the body is usually an error envelope.
    pub async fn send_json(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<(StatusCode, Value), ClientError> {
        let (mut sender, conn) = self.handshake().await?;
        tokio::spawn(async move {
            if let Err(e) = conn.await {
                debug!("API connection closed with error: {}", e);
            }
        });

        let mut builder = self.request(method, path);
        let payload = match body {
            Some(value) => {
                builder = builder.header(CONTENT_TYPE, "application/json");
                Bytes::from(serde_json::to_vec(value)?)
            }
            None => Bytes::new(),
        };

        let response = sender.send_request(builder.body(Full::new(payload))?).await?;
        let status = response.status();
        let bytes = response.into_body().collect().await?.to_bytes();

        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)?
        };
        Ok((status, json))
    }

    pub async fn get_json(&self, path: &str) -> Result<(StatusCode, Value), ClientError> {
        self.send_json(Method::GET, path, None).await
    }

    pub async fn post_json(
        &self,
        path: &str,
        body: &Value,
    ) -> Result<(StatusCode, Value), ClientError> {
        self.send_json(Method::POST, path, Some(body)).await
    }

    pub async fn put_json(
        &self,
        path: &str,
        body: &Value,
    ) -> Result<(StatusCode, Value), ClientError> {
        self.send_json(Method::PUT, path, Some(body)).await
    }

    /// `data` of a `{status: "success", data}` envelope, or an error naming
    /// the status when the server answered with anything else.
    pub async fn fetch_data(&self, path: &str) -> anyhow::Result<Value> {
        let (status, mut body) = self
            .get_json(path)
            .await
            .with_context(|| format!("GET {} failed", path))?;
        if !status.is_success() {
            anyhow::bail!("GET {} returned {}", path, status);
        }
        Ok(body.get_mut("data").map(Value::take).unwrap_or(Value::Null))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_host_port_and_prefix() {
        let client = ApiClient::new("http://127.0.0.1:1337/gym/").unwrap();
        assert_eq!(client.host, "127.0.0.1");
        assert_eq!(client.port, 1337);
        assert_eq!(client.authority(), "127.0.0.1:1337");
        assert_eq!(client.url_path("/api/sse"), "/gym/api/sse");
    }

    #[test]
    fn default_port_is_80() {
        let client = ApiClient::new("http://localhost").unwrap();
        assert_eq!(client.port, 80);
        assert_eq!(client.url_path("/api/sse"), "/api/sse");
    }

    #[test]
    fn ipv6_brackets_are_stripped_for_connect() {
        let client = ApiClient::new("http://[::1]:8080").unwrap();
        assert_eq!(client.host, "::1");
        assert_eq!(client.authority(), "[::1]:8080");
    }

    #[test]
    fn rejects_non_http_urls() {
        assert!(matches!(
            ApiClient::new("https://example.com"),
            Err(ClientError::InvalidUrl(_))
        ));
        assert!(matches!(
            ApiClient::new("not a url"),
            Err(ClientError::InvalidUrl(_))
        ));
        assert!(matches!(
            ApiClient::new("/api/sse"),
            Err(ClientError::InvalidUrl(_))
        ));
    }

    #[test]
    fn request_sets_host_header() {
        let client = ApiClient::new("http://127.0.0.1:1337").unwrap();
        let req = client
            .request(Method::GET, "/health")
            .body(Full::new(Bytes::new()))
            .unwrap();
        assert_eq!(req.uri(), "/health");
        assert_eq!(req.headers()[HOST], "127.0.0.1:1337");
    }
}
