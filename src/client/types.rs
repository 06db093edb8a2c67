use crate::schema::Field;
use serde::{Deserialize, Serialize};

/// Collection metadata as returned by the service
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectionMetadata {
    pub name: String,

    /// Unix seconds
    #[serde(default)]
    pub created_at: i64,

    #[serde(default)]
    pub default_sorting_field: Option<String>,

    #[serde(default)]
    pub enable_nested_fields: bool,

    #[serde(default)]
    pub fields: Vec<Field>,

    #[serde(default)]
    pub num_documents: u64,

    #[serde(default)]
    pub symbols_to_index: Vec<String>,

    #[serde(default)]
    pub token_separators: Vec<String>,
}

/// Alias record: a named pointer to exactly one collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasInfo {
    pub name: String,
    pub collection_name: String,
}

/// Per-row result of a bulk import
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportOutcome {
    pub success: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Raw line the service could not import
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<u16>,
}

impl ImportOutcome {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
            document: None,
            code: None,
        }
    }

    pub fn failed(error: impl Into<String>, document: impl Into<String>, code: u16) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            document: Some(document.into()),
            code: Some(code),
        }
    }
}
