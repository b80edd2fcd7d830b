//! HTTP backend adapter.
//!
//! Issues `GET {base_url}/{id}` and expects a JSON array of integers. Any
//! transport error, non-success status, or undecodable body resolves to a
//! [`BackendError`], which the coordinator reports as `"request failed"`.

use futures::StreamExt;
use lifecycle_core::{BackendError, BackendFuture, RequestBackend};
use reqwest::Url;

/// Maximum accepted response size (1MB)
const MAX_RESPONSE_SIZE: usize = 1024 * 1024;

/// Backend that fetches payloads over HTTP
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpBackend {
    /// Create a backend rooted at `base_url`
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::InvalidRequest`] if `base_url` is not an
    /// absolute `http://` or `https://` URL.
    pub fn new(base_url: &str) -> Result<Self, BackendError> {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    /// Create a backend with a preconfigured client (timeouts, headers, ...)
    ///
    /// # Errors
    ///
    /// Same as [`HttpBackend::new`].
    pub fn with_client(client: reqwest::Client, base_url: &str) -> Result<Self, BackendError> {
        let invalid = |reason: String| BackendError::InvalidRequest {
            id: String::new(),
            reason,
        };

        let base_url = Url::parse(base_url).map_err(|e| invalid(e.to_string()))?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(invalid(format!("unsupported scheme '{}'", base_url.scheme())));
        }
        if base_url.cannot_be_a_base() {
            return Err(invalid("URL cannot be a base".to_string()));
        }

        Ok(Self { client, base_url })
    }

    /// URL requested for `id`
    ///
    /// The id is appended as a single percent-encoded path segment.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::InvalidRequest`] if the base URL cannot take
    /// path segments.
    pub fn url_for(&self, id: &str) -> Result<Url, BackendError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| BackendError::InvalidRequest {
                id: id.to_string(),
                reason: "URL cannot be a base".to_string(),
            })?
            .pop_if_empty()
            .push(id);
        Ok(url)
    }
}

impl RequestBackend for HttpBackend {
    fn request(&self, id: &str) -> BackendFuture {
        let client = self.client.clone();
        let url = self.url_for(id);

        Box::pin(async move {
            let url = url?;
            tracing::trace!(url = %url, "Sending backend request");

            let response = client
                .get(url)
                .send()
                .await
                .map_err(|e| BackendError::Transport(e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                return Err(BackendError::Status(status.as_u16()));
            }

            if response
                .content_length()
                .is_some_and(|len| len > MAX_RESPONSE_SIZE as u64)
            {
                return Err(BackendError::ResponseTooLarge(MAX_RESPONSE_SIZE));
            }

            // Stream response with size limit
            let mut body = Vec::new();
            let mut stream = response.bytes_stream();

            while let Some(chunk) = stream.next().await {
                let chunk = chunk.map_err(|e| BackendError::Transport(e.to_string()))?;

                if body.len() + chunk.len() > MAX_RESPONSE_SIZE {
                    return Err(BackendError::ResponseTooLarge(MAX_RESPONSE_SIZE));
                }

                body.extend_from_slice(&chunk);
            }

            serde_json::from_slice::<Vec<i64>>(&body)
                .map_err(|e| BackendError::Decode(e.to_string()))
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Test code
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Serve a single canned response on a local port
    ///
    /// Returns the base URL and a handle yielding the raw request head.
    async fn serve_once(
        status: &'static str,
        body: Vec<u8>,
        declare_length: bool,
    ) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();

            let mut head = Vec::new();
            let mut buf = [0u8; 1024];
            while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                head.extend_from_slice(&buf[..n]);
            }

            let mut response = format!("HTTP/1.1 {status}\r\nContent-Type: application/json\r\n");
            if declare_length {
                response.push_str(&format!("Content-Length: {}\r\n", body.len()));
            }
            response.push_str("Connection: close\r\n\r\n");

            // The client may hang up early once it hits the size cap.
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.write_all(&body).await;
            let _ = socket.shutdown().await;

            String::from_utf8_lossy(&head).into_owned()
        });

        (format!("http://{addr}/items"), server)
    }

    #[test]
    fn test_url_for_appends_segment() {
        let backend = HttpBackend::new("https://api.example.com/items").unwrap();
        assert_eq!(
            backend.url_for("42").unwrap().as_str(),
            "https://api.example.com/items/42"
        );
    }

    #[test]
    fn test_url_for_handles_trailing_slash_and_encoding() {
        let backend = HttpBackend::new("http://localhost:8080/items/").unwrap();
        assert_eq!(
            backend.url_for("a b/c").unwrap().as_str(),
            "http://localhost:8080/items/a%20b%2Fc"
        );
    }

    #[test]
    fn test_rejects_non_http_urls() {
        assert!(matches!(
            HttpBackend::new("ftp://example.com"),
            Err(BackendError::InvalidRequest { .. })
        ));
        assert!(matches!(
            HttpBackend::new("not a url"),
            Err(BackendError::InvalidRequest { .. })
        ));
    }

    #[tokio::test]
    async fn test_json_array_is_decoded() {
        let (base_url, server) = serve_once("200 OK", b"[1,2,3]".to_vec(), true).await;
        let backend = HttpBackend::new(&base_url).unwrap();

        let result = backend.request("42").await;

        assert_eq!(result, Ok(vec![1, 2, 3]));
        assert!(server.await.unwrap().starts_with("GET /items/42 HTTP/1.1\r\n"));
    }

    #[tokio::test]
    async fn test_non_success_status_is_reported() {
        let (base_url, _server) =
            serve_once("503 Service Unavailable", b"[]".to_vec(), true).await;
        let backend = HttpBackend::new(&base_url).unwrap();

        let result = backend.request("1").await;

        assert_eq!(result, Err(BackendError::Status(503)));
    }

    #[tokio::test]
    async fn test_non_json_body_is_decode_error() {
        let (base_url, _server) = serve_once("200 OK", b"<html>oops</html>".to_vec(), true).await;
        let backend = HttpBackend::new(&base_url).unwrap();

        let result = backend.request("1").await;

        assert!(matches!(result, Err(BackendError::Decode(_))));
    }

    #[tokio::test]
    async fn test_declared_oversized_body_is_rejected() {
        let body = vec![b' '; MAX_RESPONSE_SIZE + 1];
        let (base_url, _server) = serve_once("200 OK", body, true).await;
        let backend = HttpBackend::new(&base_url).unwrap();

        let result = backend.request("1").await;

        assert_eq!(result, Err(BackendError::ResponseTooLarge(MAX_RESPONSE_SIZE)));
    }

    #[tokio::test]
    async fn test_streamed_oversized_body_is_rejected() {
        let body = vec![b' '; MAX_RESPONSE_SIZE + 1];
        let (base_url, _server) = serve_once("200 OK", body, false).await;
        let backend = HttpBackend::new(&base_url).unwrap();

        let result = backend.request("1").await;

        assert_eq!(result, Err(BackendError::ResponseTooLarge(MAX_RESPONSE_SIZE)));
    }

    #[tokio::test]
    async fn test_closed_port_is_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let backend = HttpBackend::new(&format!("http://{addr}/items")).unwrap();

        let result = backend.request("1").await;

        assert!(matches!(result, Err(BackendError::Transport(_))));
    }
}
