//! Outbound email. Nothing here is cached.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use futures::{stream, StreamExt, TryStreamExt};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use super::transport::{ensure_success, Transport};
use crate::error::{Error, Result};

const EMAIL_PATH: &str = "email";
const MESSAGE_ID_HEADER: &str = "x-message-id";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Recipient {
  pub email: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,
}

impl Recipient {
  pub fn new(email: impl Into<String>) -> Self {
    Self {
      email: email.into(),
      name: None,
    }
  }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Personalization {
  pub email: String,
  pub data: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
  /// Base64-encoded file content
  pub content: String,
  pub filename: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub disposition: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub id: Option<String>,
}

impl Attachment {
  /// Read a file from disk and encode it as a regular attachment.
  pub fn from_path(path: &Path) -> Result<Self> {
    let filename = path
      .file_name()
      .and_then(|n| n.to_str())
      .ok_or_else(|| Error::invalid(format!("Attachment path has no file name: {}", path.display())))?
      .to_string();

    let bytes = std::fs::read(path).map_err(|e| {
      Error::invalid(format!("Failed to read attachment {}: {}", path.display(), e))
    })?;

    Ok(Self {
      content: STANDARD.encode(bytes),
      filename,
      disposition: Some("attachment".to_string()),
      id: None,
    })
  }
}

/// Request envelope for `POST /email`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmailMessage {
  pub from: Recipient,
  pub to: Vec<Recipient>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub cc: Vec<Recipient>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub bcc: Vec<Recipient>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub reply_to: Option<Recipient>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub subject: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub text: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub html: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub template_id: Option<String>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub tags: Vec<String>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub personalization: Vec<Personalization>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub attachments: Vec<Attachment>,
  /// Unix timestamp for scheduled delivery
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub send_at: Option<i64>,
}

impl EmailMessage {
  pub fn validate(&self) -> Result<()> {
    if self.from.email.trim().is_empty() {
      return Err(Error::invalid("sender (from) email is required"));
    }
    if self.to.is_empty() {
      return Err(Error::invalid("at least one recipient (to) is required"));
    }
    if let Some(r) = self
      .to
      .iter()
      .chain(&self.cc)
      .chain(&self.bcc)
      .find(|r| r.email.trim().is_empty())
    {
      return Err(Error::invalid(format!("recipient has an empty email: {:?}", r)));
    }
    if self.text.is_none() && self.html.is_none() && self.template_id.is_none() {
      return Err(Error::invalid("one of text, html or template_id is required"));
    }
    let has_subject = self.subject.as_deref().is_some_and(|s| !s.trim().is_empty());
    if self.template_id.is_none() && !has_subject {
      return Err(Error::invalid("subject is required unless a template is used"));
    }
    Ok(())
  }
}

/// Result of one accepted message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SentEmail {
  pub message_id: String,
}

pub struct EmailClient {
  transport: Arc<Transport>,
}

impl EmailClient {
  pub fn new(transport: Arc<Transport>) -> Self {
    Self { transport }
  }

  /// Send one message. The provider's message id comes back in the
  /// `x-message-id` response header.
  pub async fn send(&self, message: &EmailMessage) -> Result<SentEmail> {
    message.validate()?;

    let response = self
      .transport
      .send(Method::POST, EMAIL_PATH, Some(message))
      .await
      .inspect_err(|e| warn!(to = message.to.len(), error = %e, "email send failed"))?;

    let response = ensure_success(response)
      .await
      .inspect_err(|e| warn!(to = message.to.len(), error = %e, "email rejected"))?;

    let message_id = response
      .headers()
      .get(MESSAGE_ID_HEADER)
      .and_then(|v| v.to_str().ok())
      .filter(|v| !v.is_empty())
      .map(String::from)
      .ok_or_else(|| {
        Error::unexpected(
          "Email accepted but no message id returned",
          format!("missing {} header (status {})", MESSAGE_ID_HEADER, response.status()),
        )
      })?;

    info!(message_id = %message_id, "email accepted");
    Ok(SentEmail { message_id })
  }

  /// Send messages one at a time, in order. The first failure propagates and
  /// the remaining messages are not attempted.
  pub async fn bulk_send(&self, messages: &[EmailMessage]) -> Result<Vec<SentEmail>> {
    stream::iter(messages.iter().enumerate())
      .then(|(index, message)| async move {
        self
          .send(message)
          .await
          .inspect_err(|e| warn!(index, total = messages.len(), error = %e, "bulk send stopped"))
      })
      .try_collect()
      .await
  }
}
