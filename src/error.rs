//! Error taxonomy shared by the API clients and the cache.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum Error {
  /// Bad input caught before any I/O (ids, pagination bounds, missing config).
  #[error("Invalid argument: {0}")]
  InvalidArgument(String),

  /// The API answered with a non-2xx status.
  #[error("API request failed with status {status}: {body}")]
  Api { status: u16, body: String },

  /// DNS, refused connection, timeout and other transport failures.
  #[error("Connection error: {0}")]
  Connection(#[source] reqwest::Error),

  #[error("{context}: {source}")]
  Unexpected {
    context: String,
    #[source]
    source: BoxError,
  },
}

impl Error {
  pub fn invalid(msg: impl Into<String>) -> Self {
    Self::InvalidArgument(msg.into())
  }

  pub fn unexpected(
    context: impl Into<String>,
    source: impl Into<BoxError>,
  ) -> Self {
    Self::Unexpected {
      context: context.into(),
      source: source.into(),
    }
  }

  /// Classify a reqwest failure: transport problems stay distinguishable from
  /// everything else so callers can decide between retrying and aborting.
  pub fn from_transport(err: reqwest::Error, context: &str) -> Self {
    if err.is_connect() || err.is_timeout() || err.is_request() {
      Self::Connection(err)
    } else {
      Self::unexpected(context, err)
    }
  }

  pub fn is_invalid_argument(&self) -> bool {
    matches!(self, Self::InvalidArgument(_))
  }

  pub fn is_connection(&self) -> bool {
    matches!(self, Self::Connection(_))
  }

  pub fn status(&self) -> Option<u16> {
    match self {
      Self::Api { status, .. } => Some(*status),
      _ => None,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_api_error_message_includes_status_and_body() {
    let err = Error::Api {
      status: 422,
      body: r#"{"message":"The name field is required."}"#.to_string(),
    };
    let msg = err.to_string();
    assert!(msg.contains("422"));
    assert!(msg.contains("name field is required"));
    assert_eq!(err.status(), Some(422));
  }

  #[test]
  fn test_unexpected_preserves_source() {
    let parse_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
    let err = Error::unexpected("Failed to decode domains page", parse_err);
    assert!(std::error::Error::source(&err).is_some());
    assert!(err.to_string().starts_with("Failed to decode domains page"));
    assert!(!err.is_invalid_argument());
    assert!(!err.is_connection());
  }

  #[test]
  fn test_invalid_argument_kind() {
    let err = Error::invalid("limit must be between 1 and 100");
    assert!(err.is_invalid_argument());
    assert_eq!(err.status(), None);
  }
}
