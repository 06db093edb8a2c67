use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// One matching document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Hit {
    #[serde(default)]
    pub document: Value,
    #[serde(default)]
    pub highlights: Vec<Value>,
    #[serde(default)]
    pub text_match: Option<Value>,
}

impl Hit {
    /// Text-match rank; larger is more relevant, only comparable within a query
    pub fn score(&self) -> Option<u64> {
        self.text_match.as_ref().and_then(Value::as_u64)
    }
}

/// Hits sharing the same `group_by` values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupedHit {
    #[serde(default)]
    pub group_key: Vec<Value>,
    #[serde(default)]
    pub hits: Vec<Hit>,
    #[serde(default)]
    pub found: u64,
}

impl GroupedHit {
    pub fn count(&self) -> u64 {
        self.found
    }
}

/// One value bucket of a faceted field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Facet {
    pub key: String,
    pub value: String,
    pub count: u64,
    pub highlighted: String,
}

/// A search response.
///
/// Accessors read the raw response and fall back to defaults for missing
/// keys.
#[derive(Debug, Clone, PartialEq)]
pub struct Results {
    raw: Value,
}

impl From<Value> for Results {
    fn from(raw: Value) -> Self {
        Self::new(raw)
    }
}

impl Results {
    pub fn new(raw: Value) -> Self {
        Self { raw }
    }

    pub fn raw(&self) -> &Value {
        &self.raw
    }

    pub fn into_raw(self) -> Value {
        self.raw
    }

    /// Per-search error reported inside a multi-search response
    pub fn error(&self) -> Option<&str> {
        self.raw.get("error").and_then(Value::as_str)
    }

    pub fn hits(&self) -> Vec<Hit> {
        self.list("hits")
    }

    /// Present only when grouping was requested
    pub fn grouped_hits(&self) -> Option<Vec<GroupedHit>> {
        self.raw.get("grouped_hits").map(|_| self.list("grouped_hits"))
    }

    /// Total number of matches
    pub fn count(&self) -> u64 {
        self.number(&self.raw["found"]).unwrap_or(0)
    }

    /// Number of documents searched
    pub fn out_of(&self) -> u64 {
        self.number(&self.raw["out_of"]).unwrap_or(0)
    }

    pub fn current_page(&self) -> u64 {
        self.number(&self.raw["page"]).unwrap_or(1)
    }

    /// Page size echoed back by the service
    pub fn per_page(&self) -> Option<u64> {
        self.number(&self.raw["request_params"]["per_page"])
    }

    pub fn search_time_ms(&self) -> Option<u64> {
        self.number(&self.raw["search_time_ms"])
    }

    /// `ceil(count / per_page)`; 0 without a page size
    pub fn total_pages(&self) -> u64 {
        match self.per_page() {
            Some(per_page) if per_page > 0 => (self.count() + per_page - 1) / per_page,
            _ => 0,
        }
    }

    pub fn is_first_page(&self) -> bool {
        self.current_page() <= 1
    }

    /// `current_page >= total_pages`, not strict equality: an empty result
    /// (zero pages) counts as its own last page
    pub fn is_last_page(&self) -> bool {
        self.current_page() >= self.total_pages()
    }

    pub fn prev_page(&self) -> Option<u64> {
        (!self.is_first_page()).then(|| self.current_page() - 1)
    }

    pub fn next_page(&self) -> Option<u64> {
        (!self.is_last_page()).then(|| self.current_page() + 1)
    }

    /// Value buckets for every faceted field, in response order
    pub fn facets(&self) -> Vec<(String, Vec<Facet>)> {
        self.raw["facet_counts"]
            .as_array()
            .map(|fields| {
                fields
                    .iter()
                    .filter_map(|field| {
                        let key = field["field_name"].as_str()?.to_string();
                        let counts = field["counts"]
                            .as_array()
                            .map(|counts| {
                                counts
                                    .iter()
                                    .map(|count| Facet {
                                        key: key.clone(),
                                        value: text(&count["value"]),
                                        count: count["count"].as_u64().unwrap_or(0),
                                        highlighted: text(&count["highlighted"]),
                                    })
                                    .collect()
                            })
                            .unwrap_or_default();
                        Some((key, counts))
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn facet_counts(&self, field: &str) -> Option<Vec<Facet>> {
        self.facets()
            .into_iter()
            .find(|(key, _)| key == field)
            .map(|(_, counts)| counts)
    }

    /// Entries that fail to decode are skipped with a warning
    fn list<T: serde::de::DeserializeOwned>(&self, key: &str) -> Vec<T> {
        self.raw[key]
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .enumerate()
                    .filter_map(|(position, item)| {
                        serde_json::from_value(item.clone())
                            .map_err(|err| {
                                warn!(key, position, error = %err, "Skipping malformed entry in search response");
                            })
                            .ok()
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn number(&self, value: &Value) -> Option<u64> {
        value
            .as_u64()
            .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
    }
}

fn text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
