use super::facet::{self, FacetSpec};
use super::results::Results;
use crate::client::{Backend, SearchParams};
use crate::error::Result;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use strum::{Display, EnumString};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum SortDirection {
    Asc,
    Desc,
}

/// Fields a free-text query is matched against
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryBy {
    /// Equal weight, in order
    Fields(Vec<String>),
    /// Field and weight pairs, sent as position-aligned lists
    Weighted(Vec<(String, u32)>),
}

impl QueryBy {
    fn fields(&self) -> Vec<&str> {
        match self {
            QueryBy::Fields(fields) => fields.iter().map(String::as_str).collect(),
            QueryBy::Weighted(fields) => fields.iter().map(|(field, _)| field.as_str()).collect(),
        }
    }

    fn weights(&self) -> Option<Vec<u32>> {
        match self {
            QueryBy::Fields(_) => None,
            QueryBy::Weighted(fields) => Some(fields.iter().map(|(_, weight)| *weight).collect()),
        }
    }
}

impl From<&str> for QueryBy {
    fn from(field: &str) -> Self {
        QueryBy::Fields(vec![field.to_string()])
    }
}

impl From<String> for QueryBy {
    fn from(field: String) -> Self {
        QueryBy::Fields(vec![field])
    }
}

impl From<Vec<&str>> for QueryBy {
    fn from(fields: Vec<&str>) -> Self {
        QueryBy::Fields(fields.into_iter().map(str::to_string).collect())
    }
}

impl From<Vec<String>> for QueryBy {
    fn from(fields: Vec<String>) -> Self {
        QueryBy::Fields(fields)
    }
}

impl<const N: usize> From<[&str; N]> for QueryBy {
    fn from(fields: [&str; N]) -> Self {
        QueryBy::Fields(fields.iter().map(|field| field.to_string()).collect())
    }
}

impl From<Vec<(&str, u32)>> for QueryBy {
    fn from(fields: Vec<(&str, u32)>) -> Self {
        QueryBy::Weighted(
            fields
                .into_iter()
                .map(|(field, weight)| (field.to_string(), weight))
                .collect(),
        )
    }
}

impl<const N: usize> From<[(&str, u32); N]> for QueryBy {
    fn from(fields: [(&str, u32); N]) -> Self {
        QueryBy::Weighted(
            fields
                .iter()
                .map(|(field, weight)| (field.to_string(), *weight))
                .collect(),
        )
    }
}

/// Chainable query builder bound to one collection (or alias).
///
/// Nothing is sent until [`Search::load`]; [`Search::compile`] shows the
/// exact wire parameters.
#[derive(Clone)]
pub struct Search {
    backend: Backend,
    collection: String,
    query: String,
    query_by: QueryBy,
    filter_by: Vec<String>,
    sort_by: Vec<String>,
    facet_by: Vec<String>,
    facet_query: Vec<String>,
    facet_return_parent: Vec<String>,
    include_fields: Vec<String>,
    exclude_fields: Vec<String>,
    group_by: Vec<String>,
    /// `None` removes the key from the compiled parameters
    params: BTreeMap<String, Option<String>>,
}

impl fmt::Debug for Search {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Search")
            .field("params", &self.compile())
            .finish()
    }
}

impl Search {
    pub fn new(
        backend: Backend,
        collection: impl Into<String>,
        query: impl Into<String>,
        query_by: impl Into<QueryBy>,
    ) -> Self {
        Self {
            backend,
            collection: collection.into(),
            query: query.into(),
            query_by: query_by.into(),
            filter_by: Vec::new(),
            sort_by: Vec::new(),
            facet_by: Vec::new(),
            facet_query: Vec::new(),
            facet_return_parent: Vec::new(),
            include_fields: Vec::new(),
            exclude_fields: Vec::new(),
            group_by: Vec::new(),
            params: BTreeMap::new(),
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub(crate) fn backend(&self) -> &Backend {
        &self.backend
    }

    /// Add a raw filter expression; all filters are ANDed
    pub fn filter(mut self, expression: impl Into<String>) -> Self {
        self.filter_by.push(expression.into());
        self
    }

    pub fn filters<I, S>(mut self, expressions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.filter_by.extend(expressions.into_iter().map(Into::into));
        self
    }

    /// Add `field:value`
    pub fn filter_eq(mut self, field: &str, value: impl fmt::Display) -> Self {
        self.filter_by.push(format!("{}:{}", field, value));
        self
    }

    /// Add a raw sort expression
    pub fn sort(mut self, expression: impl Into<String>) -> Self {
        self.sort_by.push(expression.into());
        self
    }

    pub fn sort_by(mut self, field: &str, direction: SortDirection) -> Self {
        self.sort_by.push(format!("{}:{}", field, direction));
        self
    }

    pub fn facet(mut self, field: impl Into<String>) -> Self {
        self.facet_by.push(field.into());
        self
    }

    pub fn facet_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.facet_by.extend(fields.into_iter().map(Into::into));
        self
    }

    /// Facet one field with a sub-query or options.
    ///
    /// Malformed sort or range options fail with `InvalidArgument`.
    pub fn facet_with(mut self, field: &str, spec: impl Into<FacetSpec>) -> Result<Self> {
        let compiled = facet::compile(field, &spec.into())?;
        self.facet_by.push(compiled.facet_by);
        self.facet_query.extend(compiled.facet_query);
        self.facet_return_parent.extend(compiled.return_parent);
        Ok(self)
    }

    /// Facet several fields, in order
    pub fn facets<I, K>(self, entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, FacetSpec)>,
        K: AsRef<str>,
    {
        entries
            .into_iter()
            .try_fold(self, |search, (field, spec)| search.facet_with(field.as_ref(), spec))
    }

    /// Facets from untyped JSON; see the `facet` module for accepted shapes
    pub fn facet_json(self, facets: &Value) -> Result<Self> {
        self.facets(facet::from_json(facets)?)
    }

    pub fn include_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.include_fields.extend(fields.into_iter().map(Into::into));
        self
    }

    pub fn exclude_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_fields.extend(fields.into_iter().map(Into::into));
        self
    }

    pub fn group_by<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.group_by.extend(fields.into_iter().map(Into::into));
        self
    }

    pub fn per(self, count: u32) -> Self {
        self.set("per_page", count)
    }

    pub fn page(self, number: u32) -> Self {
        self.set("page", number)
    }

    /// Set any service parameter; applied after computed ones
    pub fn set(mut self, key: impl Into<String>, value: impl fmt::Display) -> Self {
        self.params.insert(key.into(), Some(value.to_string()));
        self
    }

    /// Omit a parameter, including a computed one
    pub fn unset(mut self, key: impl Into<String>) -> Self {
        self.params.insert(key.into(), None);
        self
    }

    /// Wire parameters, including `collection`.
    ///
    /// Empty values are dropped; the service treats a present-but-empty
    /// parameter differently from an absent one.
    pub fn compile(&self) -> SearchParams {
        let mut compiled = SearchParams::new();
        let mut put = |key: &str, value: String| {
            compiled.insert(key.to_string(), value);
        };

        put("collection", self.collection.clone());
        put("q", self.query.clone());
        put("query_by", self.query_by.fields().join(","));
        if let Some(weights) = self.query_by.weights() {
            let weights: Vec<String> = weights.iter().map(u32::to_string).collect();
            put("query_by_weights", weights.join(","));
        }
        put("filter_by", self.filter_by.join(" && "));
        put("sort_by", self.sort_by.join(","));
        put("facet_by", self.facet_by.join(","));
        put("facet_return_parent", self.facet_return_parent.join(","));
        put("facet_query", self.facet_query.join(","));
        put("include_fields", self.include_fields.join(","));
        put("exclude_fields", self.exclude_fields.join(","));
        put("group_by", self.group_by.join(","));

        for (key, value) in &self.params {
            match value {
                Some(value) => compiled.insert(key.clone(), value.clone()),
                None => compiled.remove(key),
            };
        }

        compiled.retain(|_, value| !value.is_empty());
        compiled
    }

    /// Execute and wrap the response
    pub async fn load(&self) -> Result<Results> {
        let mut params = self.compile();
        params.remove("collection");

        debug!(collection = %self.collection, params = ?params, "Executing search");
        let raw = self.backend.search(&self.collection, &params).await?;
        Ok(Results::new(raw))
    }
}
