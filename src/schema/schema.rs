use super::field::Field;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Ordered field definitions plus collection-level options.
///
/// Schemas are values: extending one (`Schema::extend`) starts from a deep
/// copy, so a derived index can append fields without touching its parent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    fields: Vec<Field>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    token_separators: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    symbols_to_index: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    default_sorting_field: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    enable_nested_fields: Option<bool>,
}

impl Schema {
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::new()
    }

    /// A builder seeded with a copy of this schema
    pub fn extend(&self) -> SchemaBuilder {
        SchemaBuilder {
            schema: self.clone(),
        }
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn token_separators(&self) -> Option<&[String]> {
        self.token_separators.as_deref()
    }

    pub fn symbols_to_index(&self) -> Option<&[String]> {
        self.symbols_to_index.as_deref()
    }

    pub fn default_sorting_field(&self) -> Option<&str> {
        self.default_sorting_field.as_deref()
    }

    pub fn enable_nested_fields(&self) -> Option<bool> {
        self.enable_nested_fields
    }

    /// Request body fragment for collection creation; unset options are omitted
    pub fn to_wire(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| Value::Object(Default::default()))
    }

    /// Full create-collection body for `name`
    pub fn to_wire_named(&self, name: &str) -> Value {
        let mut body = self.to_wire();
        if let Value::Object(map) = &mut body {
            map.insert("name".to_string(), Value::String(name.to_string()));
        }
        body
    }
}

/// Declarative accumulation of a [`Schema`]
#[derive(Debug, Clone, Default)]
pub struct SchemaBuilder {
    schema: Schema,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_field(mut self, field: Field) -> Self {
        self.schema.fields.push(field);
        self
    }

    pub fn add_fields(mut self, fields: impl IntoIterator<Item = Field>) -> Self {
        self.schema.fields.extend(fields);
        self
    }

    pub fn token_separators<I, S>(mut self, separators: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.schema.token_separators = Some(separators.into_iter().map(Into::into).collect());
        self
    }

    pub fn symbols_to_index<I, S>(mut self, symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.schema.symbols_to_index = Some(symbols.into_iter().map(Into::into).collect());
        self
    }

    pub fn default_sorting_field(mut self, field_name: impl Into<String>) -> Self {
        self.schema.default_sorting_field = Some(field_name.into());
        self
    }

    pub fn enable_nested_fields(mut self, enabled: bool) -> Self {
        self.schema.enable_nested_fields = Some(enabled);
        self
    }

    pub fn build(self) -> Schema {
        self.schema
    }
}
