//! Peer HTTP Client
//!
//! Plain HTTP/1.1 over a fresh loopback connection per request, driven by
//! hyper. Every call is bounded by the configured timeout; the caller sees
//! refused, timed-out, non-2xx and undecodable answers alike as a failure.

use crate::wire::{PeerRequest, SyncPayload};
use async_trait::async_trait;
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::header::{CONTENT_TYPE, HOST, USER_AGENT};
use hyper::Request;
use hyper::http::uri::Authority;
use hyper_util::rt::TokioIo;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpStream;
use tracing::{debug, info};

/// Peer round-trip errors
#[derive(Debug, Error)]
pub enum PeerError {
    #[error("Invalid peer address: {0}")]
    InvalidAddress(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Request timeout")]
    Timeout,

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Peer answered with status {0}")]
    Status(u16),

    #[error("Body read error: {0}")]
    Body(String),

    #[error("Could not encode request: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("Undecodable payload: {0}")]
    Decode(#[source] serde_json::Error),
}

/// A download-manager peer.
#[async_trait]
pub trait Peer: Send + Sync {
    /// One request, one sync payload back.
    async fn exchange(&self, request: PeerRequest) -> Result<SyncPayload, PeerError>;
}

/// Peer client configuration
#[derive(Debug, Clone)]
pub struct PeerConfig {
    /// `host:port` of the daemon
    pub address: String,
    /// Bound on connect + request + body
    pub timeout: Duration,
    pub max_body_size: usize,
    pub user_agent: String,
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:8597".to_string(),
            timeout: Duration::from_secs(5),
            max_body_size: 4 * 1024 * 1024,
            user_agent: format!("snare/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Client statistics
#[derive(Debug, Default)]
pub struct PeerStats {
    pub requests: AtomicU64,
    pub failures: AtomicU64,
    pub bytes_received: AtomicU64,
}

/// HTTP peer on loopback
#[derive(Debug)]
pub struct HttpPeer {
    config: PeerConfig,
    stats: PeerStats,
}

impl HttpPeer {
    pub fn new(config: PeerConfig) -> Self {
        info!(
            "Peer client for {} (timeout: {:?})",
            config.address, config.timeout
        );
        Self {
            config,
            stats: PeerStats::default(),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(PeerConfig::default())
    }

    pub fn config(&self) -> &PeerConfig {
        &self.config
    }

    pub fn stats(&self) -> &PeerStats {
        &self.stats
    }

    async fn round_trip(&self, request: &PeerRequest) -> Result<SyncPayload, PeerError> {
        let body = request.body().map_err(PeerError::Encode)?;
        let authority: Authority = self
            .config
            .address
            .parse()
            .map_err(|e: hyper::http::uri::InvalidUri| PeerError::InvalidAddress(e.to_string()))?;

        // Origin-form request line; the peer is addressed through the socket and Host.
        let mut builder = Request::builder()
            .method(request.method())
            .uri(request.path())
            .header(HOST, authority.as_str())
            .header(USER_AGENT, self.config.user_agent.as_str());
        if body.is_some() {
            builder = builder.header(CONTENT_TYPE, "application/json");
        }
        let http_request = builder
            .body(Full::new(Bytes::from(body.unwrap_or_default())))
            .map_err(|e| PeerError::Http(e.to_string()))?;

        let stream = TcpStream::connect(authority.as_str())
            .await
            .map_err(|e| PeerError::ConnectionFailed(e.to_string()))?;

        let io = TokioIo::new(stream);
        let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
            .await
            .map_err(|e| PeerError::Http(e.to_string()))?;

        tokio::spawn(async move {
            if let Err(e) = conn.await {
                debug!("Peer connection closed: {}", e);
            }
        });

        let response = sender
            .send_request(http_request)
            .await
            .map_err(|e| PeerError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PeerError::Status(status.as_u16()));
        }

        let collected = response
            .into_body()
            .collect()
            .await
            .map_err(|e| PeerError::Body(e.to_string()))?;
        let bytes = collected.to_bytes();
        if bytes.len() > self.config.max_body_size {
            return Err(PeerError::Body(format!(
                "{} bytes exceeds limit of {}",
                bytes.len(),
                self.config.max_body_size
            )));
        }
        self.stats
            .bytes_received
            .fetch_add(bytes.len() as u64, Ordering::Relaxed);

        debug!(
            "Peer {} {} -> {} ({} bytes)",
            request.method(),
            request.path(),
            status,
            bytes.len()
        );

        serde_json::from_slice(&bytes).map_err(PeerError::Decode)
    }
}

#[async_trait]
impl Peer for HttpPeer {
    async fn exchange(&self, request: PeerRequest) -> Result<SyncPayload, PeerError> {
        self.stats.requests.fetch_add(1, Ordering::Relaxed);

        let result = tokio::time::timeout(self.config.timeout, self.round_trip(&request))
            .await
            .unwrap_or(Err(PeerError::Timeout));

        if result.is_err() {
            self.stats.failures.fetch_add(1, Ordering::Relaxed);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::VidRequest;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    fn response(status: &str, body: &str) -> String {
        format!(
            "HTTP/1.1 {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        )
    }

    /// Accept one connection, answer with `reply`, hand back the raw request.
    async fn serve_once(reply: String) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut raw = Vec::new();
            let mut buf = [0u8; 1024];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                raw.extend_from_slice(&buf[..n]);
                if request_complete(&raw) {
                    break;
                }
            }
            socket.write_all(reply.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            String::from_utf8_lossy(&raw).into_owned()
        });

        (address, handle)
    }

    fn request_complete(raw: &[u8]) -> bool {
        let text = String::from_utf8_lossy(raw);
        let Some(end) = text.find("\r\n\r\n") else {
            return false;
        };
        let length = text[..end]
            .lines()
            .find_map(|line| {
                let (name, value) = line.split_once(':')?;
                name.eq_ignore_ascii_case("content-length")
                    .then(|| value.trim().parse::<usize>().ok())
                    .flatten()
            })
            .unwrap_or(0);
        raw.len() >= end + 4 + length
    }

    fn peer(address: String, timeout: Duration) -> HttpPeer {
        HttpPeer::new(PeerConfig {
            address,
            timeout,
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn test_sync_round_trip() {
        let (address, server) = serve_once(response(
            "200 OK",
            r#"{"enabled":true,"requestFileExts":["M3U8"],"videoList":[{"id":"1","text":"a","info":"b"}]}"#,
        ))
        .await;

        let payload = peer(address, Duration::from_secs(5))
            .exchange(PeerRequest::Sync)
            .await
            .unwrap();

        assert!(payload.enabled);
        assert_eq!(payload.request_file_exts, vec!["M3U8"]);
        assert_eq!(payload.video_list.len(), 1);

        let raw = server.await.unwrap();
        assert!(raw.starts_with("GET /sync HTTP/1.1\r\n"));
    }

    #[tokio::test]
    async fn test_post_carries_json_body() {
        let (address, server) = serve_once(response("200 OK", "{}")).await;

        let client = peer(address, Duration::from_secs(5));
        client
            .exchange(PeerRequest::Vid(VidRequest { vid: "v-9".into() }))
            .await
            .unwrap();

        let raw = server.await.unwrap().to_lowercase();
        assert!(raw.starts_with("post /vid http/1.1\r\n"));
        assert!(raw.contains("content-type: application/json"));
        assert!(raw.ends_with(r#"{"vid":"v-9"}"#));
        assert_eq!(client.stats().requests.load(Ordering::Relaxed), 1);
        assert_eq!(client.stats().failures.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn test_request_line_is_origin_form() {
        let (address, server) = serve_once(response("200 OK", "{}")).await;

        peer(address.clone(), Duration::from_secs(5))
            .exchange(PeerRequest::Clear)
            .await
            .unwrap();

        let raw = server.await.unwrap().to_lowercase();
        let request_line = raw.lines().next().unwrap_or_default().to_string();
        assert_eq!(request_line, "post /clear http/1.1");
        assert!(raw.contains(&format!("host: {}", address)));
    }

    #[tokio::test]
    async fn test_malformed_address_rejected() {
        let client = peer("not a host".into(), Duration::from_secs(5));

        let result = client.exchange(PeerRequest::Sync).await;

        assert!(matches!(result, Err(PeerError::InvalidAddress(_))));
        assert_eq!(client.stats().failures.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_non_success_status_fails() {
        let (address, _server) = serve_once(response("500 Internal Server Error", "{}")).await;

        let result = peer(address, Duration::from_secs(5))
            .exchange(PeerRequest::Sync)
            .await;

        assert!(matches!(result, Err(PeerError::Status(500))));
    }

    #[tokio::test]
    async fn test_undecodable_body_fails() {
        let (address, _server) = serve_once(response("200 OK", "not json")).await;

        let result = peer(address, Duration::from_secs(5))
            .exchange(PeerRequest::Clear)
            .await;

        assert!(matches!(result, Err(PeerError::Decode(_))));
    }

    #[tokio::test]
    async fn test_refused_connection_fails() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        drop(listener);

        let client = peer(address, Duration::from_secs(5));
        let result = client.exchange(PeerRequest::Sync).await;

        assert!(matches!(result, Err(PeerError::ConnectionFailed(_))));
        assert_eq!(client.stats().failures.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_silent_peer_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        let _hold = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
            drop(socket);
        });

        let result = peer(address, Duration::from_millis(100))
            .exchange(PeerRequest::Sync)
            .await;

        assert!(matches!(result, Err(PeerError::Timeout)));
    }
}
