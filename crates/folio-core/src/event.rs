use std::collections::BTreeMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Event name used for page hits. Providers that only understand page views
/// filter on this.
pub const PAGE_VIEW_EVENT: &str = "page_view";

/// A named occurrence with its property bag. This is the unit that flows
/// from the client, through the ingestion endpoint, to every provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsEvent {
    pub event: String,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

impl AnalyticsEvent {
    pub fn new(event: impl Into<String>, properties: Map<String, Value>) -> Self {
        Self {
            event: event.into(),
            properties,
        }
    }

    pub fn is_page_view(&self) -> bool {
        self.event == PAGE_VIEW_EVENT
    }

    /// Look up a string property, treating non-strings as absent.
    pub fn str_property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).and_then(Value::as_str)
    }
}

/// The page-view shape handed to `track_page_view`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageViewData {
    /// URL path, e.g. `/blog/my-post`.
    pub path: String,
    /// Full URL including scheme and host.
    pub url: String,
    pub title: String,
    pub referrer: Option<String>,
    /// RFC 3339 timestamp.
    pub timestamp: String,
}

impl PageViewData {
    /// Build page-view data from the properties the client attaches to a
    /// `page_view` event. Missing fields fall back to `/`, empty strings and
    /// the current time.
    pub fn from_event(event: &AnalyticsEvent) -> Self {
        Self {
            path: event
                .str_property("page_path")
                .filter(|p| !p.is_empty())
                .unwrap_or("/")
                .to_string(),
            url: event.str_property("page_location").unwrap_or("").to_string(),
            title: event.str_property("page_title").unwrap_or("").to_string(),
            referrer: event
                .str_property("page_referrer")
                .filter(|r| !r.is_empty())
                .map(str::to_string),
            timestamp: event
                .str_property("timestamp")
                .map(str::to_string)
                .unwrap_or_else(|| Utc::now().to_rfc3339()),
        }
    }
}

/// Request-scoped context observed by the server. Lives for one request and
/// is never persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ServerContext {
    pub client_ip: String,
    pub user_agent: String,
    pub referer: String,
    /// Lower-cased header names to their (UTF-8) values.
    pub headers: BTreeMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event_with(props: Value) -> AnalyticsEvent {
        let Value::Object(map) = props else {
            panic!("test properties must be an object");
        };
        AnalyticsEvent::new(PAGE_VIEW_EVENT, map)
    }

    #[test]
    fn page_view_data_reads_client_properties() {
        let event = event_with(json!({
            "page_path": "/blog/post",
            "page_location": "https://example.com/blog/post",
            "page_title": "Blog Post",
            "page_referrer": "https://twitter.com",
            "timestamp": "2025-10-17T00:00:00.000Z"
        }));

        let data = PageViewData::from_event(&event);
        assert_eq!(data.path, "/blog/post");
        assert_eq!(data.url, "https://example.com/blog/post");
        assert_eq!(data.title, "Blog Post");
        assert_eq!(data.referrer.as_deref(), Some("https://twitter.com"));
        assert_eq!(data.timestamp, "2025-10-17T00:00:00.000Z");
    }

    #[test]
    fn page_view_data_defaults_missing_fields() {
        let event = event_with(json!({ "page_referrer": "" }));

        let data = PageViewData::from_event(&event);
        assert_eq!(data.path, "/");
        assert_eq!(data.url, "");
        assert_eq!(data.title, "");
        assert_eq!(data.referrer, None);
        assert!(!data.timestamp.is_empty());
    }

    #[test]
    fn only_page_view_events_are_page_views() {
        assert!(event_with(json!({})).is_page_view());
        assert!(!AnalyticsEvent::new("click", Map::new()).is_page_view());
    }
}
