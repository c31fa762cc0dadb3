//! Generic client for one paginated API resource.
//!
//! `all` walks every page from the requested one until `links.next` is empty,
//! and caches the assembled collection under the caller's original
//! `(limit, page)`. Everything else goes straight to the API.

use reqwest::Method;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::api_types::{decode_single, ApiListPage};
use super::transport::{decode, ensure_success, error_body, Transport};
use super::types::{Payload, Resource};
use crate::cache::CacheService;
use crate::error::{Error, Result};

pub const MIN_LIMIT: i64 = 1;
pub const MAX_LIMIT: i64 = 100;

/// Upper bound on requests for one `all` call.
const MAX_PAGES: usize = 10_000;

/// Reject out-of-range pagination parameters before any I/O.
pub fn validate_page_request(limit: i64, page: i64) -> Result<()> {
  if !(MIN_LIMIT..=MAX_LIMIT).contains(&limit) {
    return Err(Error::invalid(format!(
      "limit must be between {} and {}, got {}",
      MIN_LIMIT, MAX_LIMIT, limit
    )));
  }
  if page < 0 {
    return Err(Error::invalid(format!("page must not be negative, got {}", page)));
  }
  Ok(())
}

/// Reject ids that are empty or would change the request path.
pub fn validate_id(what: &str, id: &str) -> Result<()> {
  if id.trim().is_empty() {
    return Err(Error::invalid(format!("{} id must not be empty", what)));
  }
  if id
    .chars()
    .any(|c| c.is_whitespace() || matches!(c, '/' | '?' | '#' | '%'))
  {
    return Err(Error::invalid(format!("{} id is malformed: {:?}", what, id)));
  }
  Ok(())
}

pub struct ResourceClient<T: Resource> {
  transport: Arc<Transport>,
  path: String,
  cache: CacheService<T>,
}

impl<T: Resource> ResourceClient<T> {
  pub fn new(transport: Arc<Transport>, path: impl Into<String>, cache: CacheService<T>) -> Self {
    Self {
      transport,
      path: path.into(),
      cache,
    }
  }

  /// Page number this resource's listing starts from.
  pub fn first_page(&self) -> i64 {
    T::FIRST_PAGE
  }

  pub fn cache_key(&self, limit: i64, page: i64) -> String {
    self.cache.generate_key(limit, page)
  }

  /// Every record from `page` through the last page, served from cache when
  /// an unexpired entry exists for this exact `(limit, page)`.
  pub async fn all(&self, limit: i64, page: i64) -> Result<Vec<T>> {
    validate_page_request(limit, page)?;

    let key = self.cache_key(limit, page);
    if self.cache.has(&key) {
      if let Some(items) = self.cache.get(&key) {
        debug!(resource = T::NAME, key = %key, count = items.len(), "cache hit");
        return Ok(items);
      }
    }
    debug!(resource = T::NAME, key = %key, "cache miss");

    let items = self.fetch_pages(limit, page).await.inspect_err(|e| {
      warn!(resource = T::NAME, limit, page, error = %e, "list request failed");
    })?;

    self.cache.put(&key, &items);
    Ok(items)
  }

  async fn fetch_pages(&self, limit: i64, start_page: i64) -> Result<Vec<T>> {
    self.fetch_pages_capped(limit, start_page, MAX_PAGES).await
  }

  /// Follow `links.next` from `start_page`, at most `max_pages` requests.
  async fn fetch_pages_capped(&self, limit: i64, start_page: i64, max_pages: usize) -> Result<Vec<T>> {
    let mut all_items = Vec::new();
    let mut page = start_page;
    let mut fetched = 0usize;

    loop {
      if fetched == max_pages {
        return Err(Error::unexpected(
          format!("Failed to list {}", T::NAME),
          format!("still reporting a next page after {} pages", max_pages),
        ));
      }

      let query = [("limit", limit.to_string()), ("page", page.to_string())];
      let response = ensure_success(self.transport.get(&self.path, &query).await?).await?;
      let body: ApiListPage<T> = decode(response, &format!("{} page {}", T::NAME, page)).await?;
      fetched += 1;

      let has_next = body.links.has_next();
      debug!(resource = T::NAME, page, count = body.data.len(), has_next, "fetched page");

      all_items.extend(body.data);

      if !has_next {
        break;
      }
      page = page
        .checked_add(1)
        .ok_or_else(|| Error::invalid(format!("page {} has no successor", page)))?;
    }

    Ok(all_items)
  }

  /// Fetch one record by id. Never served from the list cache.
  pub async fn find(&self, id: &str) -> Result<T> {
    validate_id(T::NAME, id)?;

    self
      .fetch_one(id)
      .await
      .inspect_err(|e| warn!(resource = T::NAME, id, error = %e, "lookup failed"))
  }

  async fn fetch_one(&self, id: &str) -> Result<T> {
    let path = format!("{}/{}", self.path, id);
    let response = ensure_success(self.transport.get(&path, &[]).await?).await?;
    self.decode_record(response).await
  }

  pub async fn create<P: Payload>(&self, payload: &P) -> Result<T> {
    payload.validate()?;

    let record = self
      .write(Method::POST, self.path.clone(), payload)
      .await
      .inspect_err(|e| warn!(resource = T::NAME, error = %e, "create failed"))?;
    info!(resource = T::NAME, id = record.id(), "created");
    Ok(record)
  }

  pub async fn update<P: Payload>(&self, id: &str, payload: &P) -> Result<T> {
    validate_id(T::NAME, id)?;
    payload.validate()?;

    let path = format!("{}/{}{}", self.path, id, T::UPDATE_SUFFIX);
    self
      .write(Method::PUT, path, payload)
      .await
      .inspect_err(|e| warn!(resource = T::NAME, id, error = %e, "update failed"))
  }

  /// Delete one record. An unsuccessful status yields `Ok(false)` rather than
  /// an error; transport failures still propagate.
  pub async fn delete(&self, id: &str) -> Result<bool> {
    validate_id(T::NAME, id)?;

    let path = format!("{}/{}", self.path, id);
    let response = self
      .transport
      .send::<Value>(Method::DELETE, &path, None)
      .await
      .inspect_err(|e| warn!(resource = T::NAME, id, error = %e, "delete failed"))?;

    let status = response.status();
    if !status.is_success() {
      let body = error_body(response).await;
      warn!(resource = T::NAME, id, status = status.as_u16(), body = %body, "delete rejected");
      return Ok(false);
    }
    Ok(true)
  }

  async fn write<P: Payload>(&self, method: Method, path: String, payload: &P) -> Result<T> {
    let response = self.transport.send(method, &path, Some(payload)).await?;
    let response = ensure_success(response).await?;
    self.decode_record(response).await
  }

  async fn decode_record(&self, response: reqwest::Response) -> Result<T> {
    let what = format!("{} record", T::NAME);
    let value: Value = decode(response, &what).await?;
    decode_single(value).map_err(|e| Error::unexpected(format!("Failed to decode {}", what), e))
  }
}
