//! Header carriers used to move trace context across transports.
//!
//! The carrier capability is `get`, `set` and `keys` over a transport's
//! headers. It is expressed through OpenTelemetry's [`Injector`] and
//! [`Extractor`] traits and implemented once per transport: message headers
//! here, HTTP headers via [`HeaderInjector`] and [`HeaderExtractor`].

use http::HeaderMap;
use http::header::{HeaderName, HeaderValue};
use opentelemetry::propagation::{Extractor, Injector};
use serde::{Deserialize, Serialize};

/// A single message header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub key: String,
    pub value: String,
}

/// Ordered header list attached to a message.
///
/// Keys are not deduplicated: `set` appends and `get` returns the first match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageHeaders(Vec<Header>);

impl MessageHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value of the first header named `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|h| h.key == key)
            .map(|h| h.value.as_str())
    }

    /// Appends a header.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.push(Header {
            key: key.into(),
            value: value.into(),
        });
    }

    /// Returns every header key in insertion order, duplicates included.
    pub fn keys(&self) -> Vec<&str> {
        self.0.iter().map(|h| h.key.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Header> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, String)> for MessageHeaders {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(key, value)| Header { key, value })
                .collect(),
        )
    }
}

impl Injector for MessageHeaders {
    fn set(&mut self, key: &str, value: String) {
        MessageHeaders::set(self, key, value);
    }
}

impl Extractor for MessageHeaders {
    fn get(&self, key: &str) -> Option<&str> {
        MessageHeaders::get(self, key)
    }

    fn keys(&self) -> Vec<&str> {
        MessageHeaders::keys(self)
    }
}

/// Writes propagation headers into an outgoing HTTP request.
pub struct HeaderInjector<'a>(pub &'a mut HeaderMap);

impl Injector for HeaderInjector<'_> {
    fn set(&mut self, key: &str, value: String) {
        let Ok(name) = HeaderName::from_bytes(key.as_bytes()) else {
            return;
        };
        let Ok(value) = HeaderValue::from_str(&value) else {
            return;
        };
        self.0.insert(name, value);
    }
}

/// Reads propagation headers from an incoming HTTP request.
pub struct HeaderExtractor<'a>(pub &'a HeaderMap);

impl Extractor for HeaderExtractor<'_> {
    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|v| v.to_str().ok())
    }

    fn keys(&self) -> Vec<&str> {
        self.0.keys().map(|k| k.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_returns_first_match() {
        let mut headers = MessageHeaders::new();
        headers.set("traceparent", "first");
        headers.set("traceparent", "second");

        assert_eq!(headers.get("traceparent"), Some("first"));
        assert_eq!(headers.get("missing"), None);
    }

    #[test]
    fn keys_keep_duplicates_in_order() {
        let mut headers = MessageHeaders::new();
        headers.set("a", "1");
        headers.set("b", "2");
        headers.set("a", "3");

        assert_eq!(headers.keys(), vec!["a", "b", "a"]);
        assert_eq!(headers.len(), 3);
    }

    #[test]
    fn message_headers_as_otel_carrier() {
        let mut headers = MessageHeaders::new();
        Injector::set(&mut headers, "baggage", "customer_id=alice".to_string());

        assert_eq!(Extractor::get(&headers, "baggage"), Some("customer_id=alice"));
        assert_eq!(Extractor::keys(&headers), vec!["baggage"]);
    }

    #[test]
    fn http_carrier_roundtrip() {
        let mut map = HeaderMap::new();
        HeaderInjector(&mut map).set("traceparent", "00-abc-def-01".to_string());

        let extractor = HeaderExtractor(&map);
        assert_eq!(extractor.get("traceparent"), Some("00-abc-def-01"));
        assert_eq!(extractor.keys(), vec!["traceparent"]);
    }

    #[test]
    fn http_injector_skips_invalid_values() {
        let mut map = HeaderMap::new();
        HeaderInjector(&mut map).set("baggage", "bad\nvalue".to_string());
        assert!(map.is_empty());
    }

    #[test]
    fn headers_serialize_as_list() {
        let headers: MessageHeaders = vec![("k".to_string(), "v".to_string())]
            .into_iter()
            .collect();
        let json = serde_json::to_value(&headers).unwrap();
        assert_eq!(json, serde_json::json!([{ "key": "k", "value": "v" }]));
    }
}
