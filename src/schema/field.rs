use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Name of a declared field: a literal name or a pattern matching many fields
#[derive(Debug, Clone)]
pub enum FieldName {
    Literal(String),
    Pattern(Regex),
}

impl FieldName {
    /// Wire form; patterns use their literal source text
    pub fn as_wire(&self) -> &str {
        match self {
            FieldName::Literal(name) => name,
            FieldName::Pattern(pattern) => pattern.as_str(),
        }
    }
}

impl From<&str> for FieldName {
    fn from(name: &str) -> Self {
        FieldName::Literal(name.to_string())
    }
}

impl From<String> for FieldName {
    fn from(name: String) -> Self {
        FieldName::Literal(name)
    }
}

impl From<Regex> for FieldName {
    fn from(pattern: Regex) -> Self {
        FieldName::Pattern(pattern)
    }
}

impl From<&Regex> for FieldName {
    fn from(pattern: &Regex) -> Self {
        FieldName::Pattern(pattern.clone())
    }
}

/// One field definition as sent to (and echoed by) the service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,

    #[serde(rename = "type", default = "default_type")]
    pub field_type: String,

    #[serde(default, skip_serializing_if = "is_blank")]
    pub locale: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facet: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optional: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub infix: Option<bool>,

    /// Attributes this crate does not model, kept so metadata round-trips
    #[serde(flatten, default, skip_serializing_if = "Map::is_empty")]
    pub extra: Map<String, Value>,
}

impl Field {
    pub fn new(name: impl Into<FieldName>, field_type: impl Into<String>) -> Self {
        Self {
            name: name.into().as_wire().to_string(),
            field_type: field_type.into(),
            locale: None,
            facet: None,
            index: None,
            optional: None,
            sort: None,
            infix: None,
            extra: Map::new(),
        }
    }

    /// A field whose type the service detects
    pub fn auto(name: impl Into<FieldName>) -> Self {
        Self::new(name, default_type())
    }

    pub fn locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }

    pub fn facet(mut self, facet: bool) -> Self {
        self.facet = Some(facet);
        self
    }

    pub fn index(mut self, index: bool) -> Self {
        self.index = Some(index);
        self
    }

    pub fn optional(mut self, optional: bool) -> Self {
        self.optional = Some(optional);
        self
    }

    pub fn sort(mut self, sort: bool) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn infix(mut self, infix: bool) -> Self {
        self.infix = Some(infix);
        self
    }

    /// The locale, treating an empty string as unset
    pub fn locale_value(&self) -> Option<&str> {
        self.locale.as_deref().filter(|l| !l.is_empty())
    }

    pub fn is_facet(&self) -> bool {
        self.facet.unwrap_or(false)
    }

    pub fn is_optional(&self) -> bool {
        self.optional.unwrap_or(false)
    }

    /// Pattern names (`.*`) and wildcard or auto types accept values of any shape
    pub fn is_wildcard(&self) -> bool {
        self.name.contains(".*") || self.field_type.ends_with('*') || self.field_type == "auto"
    }

    pub fn to_wire(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

fn default_type() -> String {
    "auto".to_string()
}

fn is_blank(locale: &Option<String>) -> bool {
    locale.as_deref().map_or(true, str::is_empty)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_pattern_name_uses_source() {
        let field = Field::new(Regex::new("foo.*").unwrap(), "string*");
        assert_eq!(field.name, "foo.*");
        assert!(field.is_wildcard());
    }

    #[test]
    fn test_empty_locale_is_omitted() {
        let field = Field::new("title", "string").locale("");
        assert!(field.locale_value().is_none());
        assert_eq!(field.to_wire(), json!({"name": "title", "type": "string"}));
    }

    #[test]
    fn test_locale_is_serialized() {
        let field = Field::new("title", "string").locale("ja").facet(true);
        assert_eq!(
            field.to_wire(),
            json!({"name": "title", "type": "string", "locale": "ja", "facet": true})
        );
    }

    #[test]
    fn test_unset_flags_are_omitted() {
        let wire = Field::auto("body").optional(true).to_wire();
        assert_eq!(wire, json!({"name": "body", "type": "auto", "optional": true}));
    }

    #[test]
    fn test_deserialize_service_metadata() {
        let field: Field = serde_json::from_value(json!({
            "name": "user",
            "type": "string",
            "facet": true,
            "index": true,
            "infix": false,
            "locale": "",
            "optional": false,
            "sort": false,
            "stem": false
        }))
        .unwrap();

        assert_eq!(field.name, "user");
        assert!(field.is_facet());
        assert_eq!(field.infix, Some(false));
        assert!(field.locale_value().is_none());
        assert_eq!(field.extra.get("stem"), Some(&json!(false)));
        assert!(field.to_wire().get("locale").is_none());
    }
}
