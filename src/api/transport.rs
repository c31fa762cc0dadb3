//! HTTP transport shared by every resource client.

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, Response};
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::error::{Error, Result};

/// Authenticated JSON transport rooted at the configured API endpoint.
pub struct Transport {
  http: reqwest::Client,
  base: Url,
}

impl Transport {
  /// Build a transport. Both settings are required and validated here, before
  /// any request is made.
  pub fn new(endpoint: Option<&str>, api_key: Option<&str>, timeout: Duration) -> Result<Self> {
    let endpoint = endpoint
      .map(str::trim)
      .filter(|e| !e.is_empty())
      .ok_or_else(|| Error::invalid("API endpoint is not configured"))?;
    let api_key = api_key
      .map(str::trim)
      .filter(|k| !k.is_empty())
      .ok_or_else(|| Error::invalid("API key is not configured"))?;

    let base = parse_base_url(endpoint)?;

    let mut auth = HeaderValue::from_str(&format!("Bearer {}", api_key))
      .map_err(|_| Error::invalid("API key contains characters not allowed in a header"))?;
    auth.set_sensitive(true);

    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(AUTHORIZATION, auth);

    let http = reqwest::Client::builder()
      .default_headers(headers)
      .timeout(timeout)
      .user_agent(concat!("mailctl/", env!("CARGO_PKG_VERSION")))
      .build()
      .map_err(|e| Error::unexpected("Failed to build HTTP client", e))?;

    Ok(Self { http, base })
  }

  pub fn base_url(&self) -> &Url {
    &self.base
  }

  fn url(&self, path: &str) -> Result<Url> {
    self
      .base
      .join(path.trim_start_matches('/'))
      .map_err(|e| Error::invalid(format!("Invalid request path {}: {}", path, e)))
  }

  /// Issue a GET with query parameters. The status is not checked.
  pub async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<Response> {
    let url = self.url(path)?;
    debug!(url = %url, ?query, "GET request");

    self
      .http
      .get(url)
      .query(query)
      .send()
      .await
      .map_err(|e| Error::from_transport(e, "GET request failed"))
  }

  /// Issue a request with an optional JSON body. The status is not checked.
  pub async fn send<B: Serialize + ?Sized>(
    &self,
    method: Method,
    path: &str,
    body: Option<&B>,
  ) -> Result<Response> {
    let url = self.url(path)?;
    debug!(url = %url, %method, "request");

    let mut request = self.http.request(method, url);
    if let Some(body) = body {
      request = request.json(body);
    }

    request
      .send()
      .await
      .map_err(|e| Error::from_transport(e, "Request failed"))
  }
}

/// Turn a non-2xx response into `Error::Api` carrying the body text.
pub async fn ensure_success(response: Response) -> Result<Response> {
  let status = response.status();
  if status.is_success() {
    return Ok(response);
  }

  Err(Error::Api {
    status: status.as_u16(),
    body: error_body(response).await,
  })
}

/// Body of an unsuccessful response, empty when it cannot be read.
pub async fn error_body(response: Response) -> String {
  let status = response.status().as_u16();
  response.text().await.unwrap_or_else(|e| {
    debug!(status, error = %e, "failed to read error response body");
    String::new()
  })
}

/// Read the body and decode it as JSON.
pub async fn decode<T: DeserializeOwned>(response: Response, what: &str) -> Result<T> {
  let text = response
    .text()
    .await
    .map_err(|e| Error::from_transport(e, "Failed to read response body"))?;

  serde_json::from_str(&text).map_err(|e| Error::unexpected(format!("Failed to decode {}", what), e))
}

fn parse_base_url(endpoint: &str) -> Result<Url> {
  // A trailing slash makes `join` append to the path instead of replacing
  // its last segment.
  let normalized = format!("{}/", endpoint.trim_end_matches('/'));
  let url = Url::parse(&normalized)
    .map_err(|e| Error::invalid(format!("Invalid API endpoint {}: {}", endpoint, e)))?;

  match url.scheme() {
    "http" | "https" => Ok(url),
    other => Err(Error::invalid(format!(
      "API endpoint must use http or https, got {}",
      other
    ))),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use wiremock::matchers::{header, method, path, query_param};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  fn transport(endpoint: &str) -> Transport {
    Transport::new(Some(endpoint), Some("test-key"), Duration::from_secs(5)).unwrap()
  }

  #[test]
  fn test_missing_endpoint_rejected() {
    let result = Transport::new(None, Some("key"), Duration::from_secs(5));
    assert!(matches!(result, Err(Error::InvalidArgument(_))));
  }

  #[test]
  fn test_missing_api_key_rejected() {
    let result = Transport::new(Some("https://api.example.test/v1"), Some("  "), Duration::from_secs(5));
    assert!(matches!(result, Err(Error::InvalidArgument(_))));
  }

  #[test]
  fn test_non_http_endpoint_rejected() {
    let result = Transport::new(Some("ftp://example.test"), Some("key"), Duration::from_secs(5));
    assert!(matches!(result, Err(Error::InvalidArgument(_))));
  }

  #[test]
  fn test_paths_join_under_base_path() {
    let transport = transport("https://api.example.test/v1");
    assert_eq!(
      transport.url("domains/abc/smtp-users").unwrap().as_str(),
      "https://api.example.test/v1/domains/abc/smtp-users"
    );
    assert_eq!(transport.base_url().as_str(), "https://api.example.test/v1/");
  }

  #[tokio::test]
  async fn test_requests_carry_json_and_bearer_headers() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
      .and(path("/domains"))
      .and(query_param("limit", "10"))
      .and(header("authorization", "Bearer test-key"))
      .and(header("accept", "application/json"))
      .and(header("content-type", "application/json"))
      .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
      .expect(1)
      .mount(&mock_server)
      .await;

    let transport = transport(&mock_server.uri());
    let response = transport
      .get("domains", &[("limit", "10".to_string())])
      .await
      .unwrap();
    assert!(response.status().is_success());
  }

  #[tokio::test]
  async fn test_ensure_success_maps_status_and_body() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
      .and(path("/domains/missing"))
      .respond_with(ResponseTemplate::new(404).set_body_string(r#"{"message":"Not found"}"#))
      .mount(&mock_server)
      .await;

    let transport = transport(&mock_server.uri());
    let response = transport.get("domains/missing", &[]).await.unwrap();
    match ensure_success(response).await {
      Err(Error::Api { status, body }) => {
        assert_eq!(status, 404);
        assert!(body.contains("Not found"));
      }
      other => panic!("expected Api error, got {:?}", other.map(|r| r.status())),
    }
  }

  #[tokio::test]
  async fn test_truncated_error_body_still_reports_status() {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
      let (mut socket, _) = listener.accept().await.unwrap();
      let mut buf = [0u8; 1024];
      let _ = socket.read(&mut buf).await;
      // Promise more body than is sent, then hang up.
      let _ = socket
        .write_all(b"HTTP/1.1 500 Internal Server Error\r\ncontent-length: 100\r\n\r\npartial")
        .await;
    });

    let transport = transport(&format!("http://{}", addr));
    let response = transport.get("domains", &[]).await.unwrap();
    match ensure_success(response).await {
      Err(Error::Api { status, body }) => {
        assert_eq!(status, 500);
        assert_eq!(body, "");
      }
      other => panic!("expected Api error, got {:?}", other.map(|r| r.status())),
    }
  }

  #[tokio::test]
  async fn test_refused_connection_is_connection_error() {
    // Bind and drop a listener to get a port nothing is listening on.
    let port = {
      let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
      listener.local_addr().unwrap().port()
    };

    let transport = transport(&format!("http://127.0.0.1:{}", port));
    let err = transport.get("domains", &[]).await.unwrap_err();
    assert!(err.is_connection(), "unexpected error kind: {:?}", err);
  }
}
