//! Serde types matching the API's response envelopes.
//!
//! These are separate from the resource records so the records stay plain
//! values while the envelopes deal with pagination metadata.

use serde::{de::DeserializeOwned, Deserialize};
use serde_json::Value;

// ============================================================================
// List endpoint response
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(bound = "T: DeserializeOwned")]
pub struct ApiListPage<T> {
  pub data: Vec<T>,
  #[serde(default)]
  pub links: ApiPageLinks,
}

#[derive(Debug, Default, Deserialize)]
pub struct ApiPageLinks {
  #[serde(default)]
  pub next: Option<Value>,
}

impl ApiPageLinks {
  /// Whether `links.next` signals another page. Any truthy JSON value counts:
  /// a non-empty URL string, `true`, a non-zero number or a non-empty container.
  pub fn has_next(&self) -> bool {
    match &self.next {
      None | Some(Value::Null) => false,
      Some(Value::Bool(b)) => *b,
      Some(Value::String(s)) => !s.is_empty(),
      Some(Value::Number(n)) => n.as_f64().is_some_and(|n| n != 0.0),
      Some(Value::Array(a)) => !a.is_empty(),
      Some(Value::Object(o)) => !o.is_empty(),
    }
  }
}

// ============================================================================
// Single-object responses
// ============================================================================

/// Reads wrap the object in `{"data": {...}}`; writes may return it bare.
/// Accept both.
pub fn decode_single<T: DeserializeOwned>(value: Value) -> serde_json::Result<T> {
  match value {
    Value::Object(mut obj) if matches!(obj.get("data"), Some(Value::Object(_))) => {
      let data = obj.remove("data").unwrap_or(Value::Null);
      serde_json::from_value(data)
    }
    other => serde_json::from_value(other),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[derive(Debug, Deserialize, PartialEq)]
  struct Item {
    id: String,
  }

  fn links(next: Value) -> ApiPageLinks {
    ApiPageLinks { next: Some(next) }
  }

  #[test]
  fn test_next_link_truthiness() {
    assert!(links(json!("https://api.example.test/v1/domains?page=2")).has_next());
    assert!(links(json!(true)).has_next());
    assert!(links(json!(1)).has_next());

    assert!(!ApiPageLinks::default().has_next());
    assert!(!links(Value::Null).has_next());
    assert!(!links(json!(false)).has_next());
    assert!(!links(json!("")).has_next());
    assert!(!links(json!(0)).has_next());
  }

  #[test]
  fn test_page_without_links_is_last() {
    let page: ApiListPage<Item> = serde_json::from_value(json!({ "data": [{ "id": "d1" }] })).unwrap();
    assert_eq!(page.data, vec![Item { id: "d1".into() }]);
    assert!(!page.links.has_next());
  }

  #[test]
  fn test_page_missing_data_fails() {
    let result: serde_json::Result<ApiListPage<Item>> =
      serde_json::from_value(json!({ "links": { "next": null } }));
    assert!(result.is_err());
  }

  #[test]
  fn test_decode_single_wrapped_and_raw() {
    let wrapped: Item = decode_single(json!({ "data": { "id": "t1" } })).unwrap();
    let raw: Item = decode_single(json!({ "id": "t2" })).unwrap();
    assert_eq!(wrapped.id, "t1");
    assert_eq!(raw.id, "t2");
  }
}
