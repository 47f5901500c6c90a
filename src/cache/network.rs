//! Network adapter used by the interceptor.

use color_eyre::{eyre::eyre, Result};
use reqwest::header::CONTENT_TYPE;
use std::future::Future;
use std::time::Duration;

use super::route::Request;
use super::traits::Response;

/// Something that can perform a live fetch.
///
/// Transport failures are errors. HTTP error statuses are returned as data.
pub trait Network: Send + Sync {
  fn fetch(&self, request: &Request) -> impl Future<Output = Result<Response>> + Send;
}

/// Network backed by a shared `reqwest` client. No retries.
#[derive(Clone)]
pub struct HttpNetwork {
  client: reqwest::Client,
}

impl HttpNetwork {
  pub fn new(timeout: Duration) -> Result<Self> {
    let client = reqwest::Client::builder()
      .user_agent(concat!("diraasti-offline/", env!("CARGO_PKG_VERSION")))
      .timeout(timeout)
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self { client })
  }
}

impl Network for HttpNetwork {
  fn fetch(&self, request: &Request) -> impl Future<Output = Result<Response>> + Send {
    let url = request.url.clone();
    let pending = self.client.get(url.clone()).send();

    async move {
      let response = pending
        .await
        .map_err(|e| eyre!("Failed to fetch {}: {}", url, e))?;

      let status = response.status().as_u16();
      let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(String::from);

      let body = response
        .bytes()
        .await
        .map_err(|e| eyre!("Failed to read body of {}: {}", url, e))?;

      Ok(Response::new(status, content_type.as_deref(), body.to_vec()))
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use tokio::io::{AsyncReadExt, AsyncWriteExt};
  use tokio::net::TcpListener;
  use tokio::sync::oneshot;
  use url::Url;

  /// Serve one canned HTTP response and hand back the raw request head.
  async fn serve_once(reply: &'static str) -> (Url, oneshot::Receiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
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
      socket.write_all(reply.as_bytes()).await.unwrap();
      socket.shutdown().await.ok();
      let _ = tx.send(String::from_utf8_lossy(&head).into_owned());
    });

    let url = Url::parse(&format!("http://{}/index.html", addr)).unwrap();
    (url, rx)
  }

  fn network() -> HttpNetwork {
    HttpNetwork::new(Duration::from_secs(5)).unwrap()
  }

  #[tokio::test]
  async fn test_http_fetch_returns_body_and_sends_user_agent() {
    let (url, head) = serve_once(
      "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nContent-Length: 13\r\nConnection: close\r\n\r\n<html></html>",
    )
    .await;

    let response = network().fetch(&Request::subresource(url)).await.unwrap();
    assert_eq!(response.status, 200);
    assert_eq!(response.content_type.as_deref(), Some("text/html"));
    assert_eq!(response.body, b"<html></html>".to_vec());

    let head = head.await.unwrap().to_ascii_lowercase();
    assert!(head.starts_with("get /index.html "));
    assert!(head.contains(&format!("user-agent: diraasti-offline/{}", env!("CARGO_PKG_VERSION"))));
  }

  #[tokio::test]
  async fn test_http_error_status_is_data() {
    let (url, _head) = serve_once(
      "HTTP/1.1 404 Not Found\r\nContent-Type: text/plain\r\nContent-Length: 9\r\nConnection: close\r\n\r\nnot found",
    )
    .await;

    let response = network().fetch(&Request::subresource(url)).await.unwrap();
    assert_eq!(response.status, 404);
    assert!(!response.is_success());
    assert_eq!(response.body, b"not found".to_vec());
  }

  #[tokio::test]
  async fn test_http_connection_refused_is_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let url = Url::parse(&format!("http://{}/src/App.js", addr)).unwrap();
    let err = network().fetch(&Request::subresource(url)).await.unwrap_err();
    assert!(err.to_string().starts_with("Failed to fetch"));
  }
}
