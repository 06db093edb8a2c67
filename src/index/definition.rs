use crate::config::Config;
use crate::naming::{self, Version};
use crate::schema::{Field, Schema};

/// Immutable description of a logical index: name, schema and env label
#[derive(Debug, Clone, PartialEq)]
pub struct IndexDefinition {
    index_name: String,
    schema: Schema,
    env: Option<String>,
}

impl IndexDefinition {
    pub fn builder(index_name: impl Into<String>) -> IndexDefinitionBuilder {
        IndexDefinitionBuilder {
            index_name: index_name.into(),
            schema: Schema::default(),
            env: None,
        }
    }

    /// Builder named after a type, e.g. `PostsIndex` gives `posts`
    pub fn for_type<T: ?Sized>() -> IndexDefinitionBuilder {
        Self::builder(infer_index_name(std::any::type_name::<T>()))
    }

    /// Builder for another index starting from a copy of this one's schema and env
    pub fn derive(&self, index_name: impl Into<String>) -> IndexDefinitionBuilder {
        IndexDefinitionBuilder {
            index_name: index_name.into(),
            schema: self.schema.clone(),
            env: self.env.clone(),
        }
    }

    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn env(&self) -> Option<&str> {
        self.env.as_deref()
    }

    /// `index[:env]`
    pub fn alias_name(&self) -> String {
        naming::alias_name(&self.index_name, self.env())
    }

    /// `index[:env]@version`
    pub fn collection_name_for(&self, version: Version) -> String {
        naming::compose(&self.index_name, self.env(), version)
    }
}

#[derive(Debug, Clone)]
pub struct IndexDefinitionBuilder {
    index_name: String,
    schema: Schema,
    env: Option<String>,
}

impl IndexDefinitionBuilder {
    pub fn index_name(mut self, index_name: impl Into<String>) -> Self {
        self.index_name = index_name.into();
        self
    }

    /// Replace the schema
    pub fn schema(mut self, schema: Schema) -> Self {
        self.schema = schema;
        self
    }

    /// Append a field to the current schema
    pub fn field(mut self, field: Field) -> Self {
        self.schema = self.schema.extend().add_field(field).build();
        self
    }

    /// Environment label; blank means none
    pub fn env(mut self, env: Option<&str>) -> Self {
        self.env = env.filter(|env| !env.is_empty()).map(str::to_string);
        self
    }

    pub fn env_from(self, config: &Config) -> Self {
        let env = config.env.clone();
        self.env(env.as_deref())
    }

    pub fn build(self) -> IndexDefinition {
        IndexDefinition {
            index_name: self.index_name,
            schema: self.schema,
            env: self.env,
        }
    }
}

/// Snake-case the last path segment of a type name and drop an `_index` suffix
pub fn infer_index_name(type_name: &str) -> String {
    let base = type_name
        .split('<')
        .next()
        .unwrap_or(type_name)
        .rsplit("::")
        .next()
        .unwrap_or(type_name);

    let chars: Vec<char> = base.chars().collect();
    let mut snake = String::with_capacity(base.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if c.is_uppercase() && i > 0 {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).map_or(false, |n| n.is_lowercase());
            if prev.is_lowercase() || prev.is_ascii_digit() || (prev.is_uppercase() && next_is_lower) {
                snake.push('_');
            }
        }
        snake.extend(c.to_lowercase());
    }

    match snake.strip_suffix("_index") {
        Some(stripped) if !stripped.is_empty() => stripped.to_string(),
        _ => snake,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigBuilder;

    #[allow(dead_code)]
    struct PostsIndex;
    #[allow(dead_code)]
    struct HTTPLogIndex;

    #[test]
    fn test_infer_index_name() {
        assert_eq!(infer_index_name("PostsIndex"), "posts");
        assert_eq!(infer_index_name("UserPostsIndex"), "user_posts");
        assert_eq!(infer_index_name("my_app::search::PostsIndex"), "posts");
        assert_eq!(infer_index_name("Posts"), "posts");
        assert_eq!(infer_index_name("Index"), "index");
    }

    #[test]
    fn test_for_type() {
        assert_eq!(IndexDefinition::for_type::<PostsIndex>().build().index_name(), "posts");
        assert_eq!(
            IndexDefinition::for_type::<HTTPLogIndex>().build().index_name(),
            "http_log"
        );
    }

    #[test]
    fn test_names() {
        let definition = IndexDefinition::builder("posts").env(Some("staging")).build();
        assert_eq!(definition.alias_name(), "posts:staging");
        assert_eq!(
            definition.collection_name_for(Version::parse("1700000000").unwrap()),
            "posts:staging@1700000000"
        );

        let bare = IndexDefinition::builder("posts").env(Some("")).build();
        assert_eq!(bare.alias_name(), "posts");
    }

    #[test]
    fn test_env_from_config() {
        let config = ConfigBuilder::new().env("production").build();
        let definition = IndexDefinition::builder("posts").env_from(&config).build();
        assert_eq!(definition.env(), Some("production"));
    }

    #[test]
    fn test_derive_copies_schema() {
        let parent = IndexDefinition::builder("posts")
            .field(Field::new("title", "string"))
            .build();
        let child = parent
            .derive("drafts")
            .field(Field::new("editor", "string"))
            .build();

        assert_eq!(parent.schema().fields().len(), 1);
        assert_eq!(child.schema().fields().len(), 2);
        assert_eq!(child.index_name(), "drafts");
    }
}
