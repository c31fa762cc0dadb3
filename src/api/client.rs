//! Builds every per-resource client up front from one transport and one
//! shared cache store.

use chrono::Duration;
use std::sync::Arc;
use tracing::{debug, warn};

use super::email::EmailClient;
use super::resource::{validate_id, ResourceClient};
use super::transport::Transport;
use super::types::{Domain, Resource, Sender, SmtpUser, Template, Token};
use crate::cache::{
  account_namespace, CacheService, CacheStore, MemoryStore, NoopStore, SqliteStore, SystemClock,
};
use crate::config::{CacheBackend, Config};
use crate::error::{Error, Result};

/// Longest cache TTL accepted from configuration.
pub const MAX_CACHE_TTL_SECS: i64 = 30 * 24 * 60 * 60;

/// Already-resolved connection settings.
#[derive(Debug, Clone)]
pub struct ClientSettings {
  pub endpoint: Option<String>,
  pub api_key: Option<String>,
  pub timeout: std::time::Duration,
  pub cache_ttl: Duration,
}

impl ClientSettings {
  pub fn from_config(config: &Config, api_key: Option<String>) -> Result<Self> {
    let ttl_secs = config.cache.ttl_secs;
    let cache_ttl = Duration::try_seconds(ttl_secs)
      .ok_or_else(|| Error::invalid(format!("cache TTL of {} seconds is out of range", ttl_secs)))?;

    Ok(Self {
      endpoint: config.api.endpoint.clone(),
      api_key,
      timeout: std::time::Duration::from_secs(config.api.timeout_secs),
      cache_ttl,
    })
  }
}

/// Entry point to the API: one client per resource, all sharing the same
/// transport and cache store.
pub struct MailClient {
  transport: Arc<Transport>,
  store: Arc<dyn CacheStore>,
  namespace: String,
  ttl: Duration,
  domains: ResourceClient<Domain>,
  senders: ResourceClient<Sender>,
  tokens: ResourceClient<Token>,
  templates: ResourceClient<Template>,
  email: EmailClient,
}

impl MailClient {
  pub fn new(settings: &ClientSettings, store: Arc<dyn CacheStore>) -> Result<Self> {
    if settings.cache_ttl <= Duration::zero() {
      return Err(Error::invalid("cache TTL must be positive"));
    }
    if settings.cache_ttl > Duration::seconds(MAX_CACHE_TTL_SECS) {
      return Err(Error::invalid(format!(
        "cache TTL must not exceed {} seconds",
        MAX_CACHE_TTL_SECS
      )));
    }

    let transport = Arc::new(Transport::new(
      settings.endpoint.as_deref(),
      settings.api_key.as_deref(),
      settings.timeout,
    )?);

    let ttl = settings.cache_ttl;
    let namespace = account_namespace(
      transport.base_url().as_str(),
      settings.api_key.as_deref().unwrap_or_default(),
    );
    debug!(
      endpoint = %transport.base_url(),
      backend = store.backend_name(),
      namespace = %namespace,
      "client ready"
    );

    Ok(Self {
      domains: resource_client(&transport, &store, &namespace, ttl, "domains", "domains"),
      senders: resource_client(&transport, &store, &namespace, ttl, "identities", "senders"),
      tokens: resource_client(&transport, &store, &namespace, ttl, "token", "tokens"),
      templates: resource_client(&transport, &store, &namespace, ttl, "templates", "templates"),
      email: EmailClient::new(Arc::clone(&transport)),
      transport,
      store,
      namespace,
      ttl,
    })
  }

  /// Build a client from configuration, opening the configured cache backend.
  pub fn from_config(config: &Config, api_key: Option<String>) -> Result<Self> {
    let settings = ClientSettings::from_config(config, api_key)?;
    Self::new(&settings, open_store(config.cache.backend))
  }

  pub fn domains(&self) -> &ResourceClient<Domain> {
    &self.domains
  }

  pub fn senders(&self) -> &ResourceClient<Sender> {
    &self.senders
  }

  pub fn tokens(&self) -> &ResourceClient<Token> {
    &self.tokens
  }

  pub fn templates(&self) -> &ResourceClient<Template> {
    &self.templates
  }

  pub fn email(&self) -> &EmailClient {
    &self.email
  }

  /// SMTP users are nested under a domain, so each domain gets its own
  /// client and its own cache prefix.
  pub fn smtp_users(&self, domain_id: &str) -> Result<ResourceClient<SmtpUser>> {
    validate_id("domain", domain_id)?;

    Ok(resource_client(
      &self.transport,
      &self.store,
      &self.namespace,
      self.ttl,
      &format!("domains/{}/smtp-users", domain_id),
      &format!("smtp_users_{}", domain_id),
    ))
  }
}

fn resource_client<T: Resource>(
  transport: &Arc<Transport>,
  store: &Arc<dyn CacheStore>,
  namespace: &str,
  ttl: Duration,
  path: &str,
  prefix: &str,
) -> ResourceClient<T> {
  let cache = CacheService::new(Arc::clone(store), namespace, prefix, ttl);
  ResourceClient::new(Arc::clone(transport), path, cache)
}

/// Open the cache store for `backend`. A SQLite store that cannot be opened
/// degrades to an in-memory one rather than failing the command.
pub fn open_store(backend: CacheBackend) -> Arc<dyn CacheStore> {
  let clock = Arc::new(SystemClock);
  match backend {
    CacheBackend::Sqlite => match SqliteStore::open(clock.clone()) {
      Ok(store) => Arc::new(store),
      Err(e) => {
        warn!(error = %e, "SQLite cache unavailable, falling back to memory");
        Arc::new(MemoryStore::new(clock))
      }
    },
    CacheBackend::Memory => Arc::new(MemoryStore::new(clock)),
    CacheBackend::None => Arc::new(NoopStore),
  }
}
