use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::error::{Error, Result};

/// A record type served by a paginated list endpoint.
pub trait Resource: Serialize + DeserializeOwned + Send + Sync + 'static {
  /// Name used in logs and error messages
  const NAME: &'static str;
  /// Page number the API starts counting from for this resource
  const FIRST_PAGE: i64 = 1;
  /// Appended to `{path}/{id}` for updates (e.g. "/settings")
  const UPDATE_SUFFIX: &'static str = "";

  fn id(&self) -> &str;
}

/// Request body sent to create/update endpoints.
pub trait Payload: Serialize + Send + Sync {
  fn validate(&self) -> Result<()> {
    Ok(())
  }
}

fn require(field: &str, value: &str) -> Result<()> {
  if value.trim().is_empty() {
    return Err(Error::invalid(format!("{} must not be empty", field)));
  }
  Ok(())
}

fn require_email(field: &str, value: &str) -> Result<()> {
  require(field, value)?;
  match value.split_once('@') {
    Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
    _ => Err(Error::invalid(format!("{} is not a valid email address: {}", field, value))),
  }
}

// ============================================================================
// Domains
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Domain {
  pub id: String,
  pub name: String,
  pub dkim: Option<bool>,
  pub spf: Option<bool>,
  pub tracking: Option<bool>,
  #[serde(default)]
  pub is_verified: bool,
  #[serde(default)]
  pub is_cname_verified: bool,
  #[serde(default)]
  pub is_dns_active: bool,
  #[serde(default)]
  pub is_cname_active: bool,
  #[serde(default)]
  pub is_tracking_allowed: bool,
  #[serde(default)]
  pub has_not_queued_messages: bool,
  #[serde(default)]
  pub not_queued_messages_count: u64,
  pub domain_settings: DomainSettings,
  pub created_at: Option<String>,
  pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DomainSettings {
  #[serde(default)]
  pub send_paused: bool,
  #[serde(default)]
  pub track_clicks: bool,
  #[serde(default)]
  pub track_opens: bool,
  #[serde(default)]
  pub track_unsubscribe: bool,
  pub track_unsubscribe_html: Option<String>,
  pub track_unsubscribe_plain: Option<String>,
  #[serde(default)]
  pub track_content: bool,
  pub track_content_html: Option<String>,
  pub track_content_plain: Option<String>,
  #[serde(default)]
  pub custom_tracking_enabled: bool,
  pub custom_tracking_subdomain: Option<String>,
  #[serde(default)]
  pub precedence_bulk: bool,
  #[serde(default)]
  pub ignore_duplicated_recipients: bool,
}

impl Resource for Domain {
  const NAME: &'static str = "domains";
  const FIRST_PAGE: i64 = 0;
  const UPDATE_SUFFIX: &'static str = "/settings";

  fn id(&self) -> &str {
    &self.id
  }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DomainCreate {
  pub name: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub return_path_subdomain: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub custom_tracking_subdomain: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub inbound_routing_subdomain: Option<String>,
}

impl Payload for DomainCreate {
  fn validate(&self) -> Result<()> {
    require("domain name", &self.name)?;
    if !self.name.contains('.') {
      return Err(Error::invalid(format!("{} is not a domain name", self.name)));
    }
    Ok(())
  }
}

/// Partial settings update; only fields that are set are sent.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DomainSettingsUpdate {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub send_paused: Option<bool>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub track_clicks: Option<bool>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub track_opens: Option<bool>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub track_unsubscribe: Option<bool>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub track_content: Option<bool>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub custom_tracking_enabled: Option<bool>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub custom_tracking_subdomain: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub precedence_bulk: Option<bool>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub ignore_duplicated_recipients: Option<bool>,
}

impl Payload for DomainSettingsUpdate {}

// ============================================================================
// Sender identities
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainRef {
  pub id: String,
  pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sender {
  pub id: String,
  pub email: String,
  pub name: String,
  pub reply_to_email: Option<String>,
  pub reply_to_name: Option<String>,
  #[serde(default)]
  pub is_verified: bool,
  #[serde(default)]
  pub resends: u64,
  #[serde(default)]
  pub add_note: bool,
  pub personal_note: Option<String>,
  pub domain: Option<DomainRef>,
}

impl Resource for Sender {
  const NAME: &'static str = "senders";

  fn id(&self) -> &str {
    &self.id
  }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SenderCreate {
  pub domain_id: String,
  pub name: String,
  pub email: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub reply_to_email: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub reply_to_name: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub add_note: Option<bool>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub personal_note: Option<String>,
}

impl Payload for SenderCreate {
  fn validate(&self) -> Result<()> {
    require("domain id", &self.domain_id)?;
    require("sender name", &self.name)?;
    require_email("sender email", &self.email)?;
    if let Some(reply_to) = &self.reply_to_email {
      require_email("reply-to email", reply_to)?;
    }
    Ok(())
  }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SenderUpdate {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub reply_to_email: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub reply_to_name: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub add_note: Option<bool>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub personal_note: Option<String>,
}

impl Payload for SenderUpdate {
  fn validate(&self) -> Result<()> {
    if let Some(name) = &self.name {
      require("sender name", name)?;
    }
    if let Some(reply_to) = &self.reply_to_email {
      require_email("reply-to email", reply_to)?;
    }
    Ok(())
  }
}

// ============================================================================
// API tokens
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
  pub id: String,
  pub name: String,
  pub status: Option<String>,
  pub created_at: Option<String>,
  #[serde(default)]
  pub scopes: Vec<String>,
  /// Only present in the create response
  #[serde(rename = "accessToken", skip_serializing_if = "Option::is_none")]
  pub access_token: Option<String>,
}

impl Resource for Token {
  const NAME: &'static str = "tokens";
  const UPDATE_SUFFIX: &'static str = "/settings";

  fn id(&self) -> &str {
    &self.id
  }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TokenCreate {
  pub name: String,
  pub domain_id: String,
  pub scopes: Vec<String>,
}

impl Payload for TokenCreate {
  fn validate(&self) -> Result<()> {
    require("token name", &self.name)?;
    require("domain id", &self.domain_id)?;
    if self.scopes.is_empty() {
      return Err(Error::invalid("at least one scope is required"));
    }
    Ok(())
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenStatus {
  Pause,
  Unpause,
}

#[derive(Debug, Clone, Serialize)]
pub struct TokenUpdate {
  pub status: TokenStatus,
}

impl Payload for TokenUpdate {}

// ============================================================================
// Templates
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Template {
  pub id: String,
  pub name: String,
  #[serde(rename = "type")]
  pub template_type: Option<String>,
  pub image_path: Option<String>,
  pub created_at: Option<String>,
  pub template_stats: TemplateStats,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TemplateStats {
  #[serde(default)]
  pub total: u64,
  #[serde(default)]
  pub queued: u64,
  #[serde(default)]
  pub sent: u64,
  #[serde(default)]
  pub rejected: u64,
  #[serde(default)]
  pub delivered: u64,
  pub last_email_sent_at: Option<String>,
}

impl Resource for Template {
  const NAME: &'static str = "templates";

  fn id(&self) -> &str {
    &self.id
  }
}

// ============================================================================
// SMTP users
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpUser {
  pub id: String,
  pub name: String,
  pub username: Option<String>,
  /// Only present in the create response
  #[serde(skip_serializing_if = "Option::is_none")]
  pub password: Option<String>,
  #[serde(default)]
  pub enabled: bool,
  pub accessed_at: Option<String>,
  pub server: Option<String>,
  pub port: Option<u16>,
  pub domain_id: Option<String>,
}

impl Resource for SmtpUser {
  const NAME: &'static str = "smtp-users";

  fn id(&self) -> &str {
    &self.id
  }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SmtpUserInput {
  pub name: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub enabled: Option<bool>,
}

impl Payload for SmtpUserInput {
  fn validate(&self) -> Result<()> {
    require("SMTP user name", &self.name)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_domain_decodes_nested_settings() {
    let domain: Domain = serde_json::from_value(json!({
      "id": "d1",
      "name": "example.com",
      "dkim": true,
      "spf": false,
      "is_verified": true,
      "domain_settings": { "send_paused": false, "track_opens": true },
      "created_at": "2024-01-01T00:00:00.000000Z"
    }))
    .unwrap();

    assert_eq!(domain.id(), "d1");
    assert_eq!(domain.dkim, Some(true));
    assert!(domain.is_verified);
    assert!(domain.domain_settings.track_opens);
    assert!(!domain.domain_settings.track_clicks);
  }

  #[test]
  fn test_domain_missing_id_fails() {
    let result: serde_json::Result<Domain> = serde_json::from_value(json!({
      "name": "example.com",
      "domain_settings": {}
    }));
    assert!(result.is_err());
  }

  #[test]
  fn test_template_type_and_stats() {
    let template: Template = serde_json::from_value(json!({
      "id": "t1",
      "name": "Welcome",
      "type": "html",
      "template_stats": { "total": 10, "delivered": 9, "last_email_sent_at": null }
    }))
    .unwrap();

    assert_eq!(template.template_type.as_deref(), Some("html"));
    assert_eq!(template.template_stats.total, 10);
    assert_eq!(template.template_stats.delivered, 9);
  }

  #[test]
  fn test_token_access_token_rename() {
    let token: Token = serde_json::from_value(json!({
      "id": "k1",
      "name": "ci",
      "status": "unpause",
      "accessToken": "mlsn.secret"
    }))
    .unwrap();
    assert_eq!(token.access_token.as_deref(), Some("mlsn.secret"));
  }

  #[test]
  fn test_payloads_skip_unset_fields() {
    let update = DomainSettingsUpdate {
      track_opens: Some(false),
      ..Default::default()
    };
    assert_eq!(serde_json::to_value(&update).unwrap(), json!({ "track_opens": false }));

    let status = TokenUpdate {
      status: TokenStatus::Pause,
    };
    assert_eq!(serde_json::to_value(&status).unwrap(), json!({ "status": "pause" }));
  }

  #[test]
  fn test_sender_create_validation() {
    let mut sender = SenderCreate {
      domain_id: "d1".into(),
      name: "Support".into(),
      email: "support@example.com".into(),
      ..Default::default()
    };
    assert!(sender.validate().is_ok());

    sender.email = "not-an-email".into();
    assert!(matches!(sender.validate(), Err(Error::InvalidArgument(_))));
  }

  #[test]
  fn test_token_create_requires_scopes() {
    let token = TokenCreate {
      name: "ci".into(),
      domain_id: "d1".into(),
      scopes: vec![],
    };
    assert!(token.validate().unwrap_err().is_invalid_argument());
  }

  #[test]
  fn test_domain_create_requires_dotted_name() {
    let domain = DomainCreate {
      name: "localhost".into(),
      ..Default::default()
    };
    assert!(domain.validate().is_err());
  }
}
