use crate::client::traits::{SearchBackend, SearchParams};
use crate::client::types::{AliasInfo, CollectionMetadata, ImportOutcome};
use crate::error::{Error, Result};
use crate::schema::Field;
use async_trait::async_trait;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::RwLock;
use serde_json::{json, Value};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;

const DEFAULT_PER_PAGE: usize = 10;

/// In-process search service (for testing and local development).
///
/// Implements the subset of the protocol this crate relies on: schema checks
/// for declared fields, `field:value` / `field:=value` filters joined by
/// `&&`, substring text matching, single-field sorting, plain value facets
/// and grouping.
#[derive(Clone, Default)]
pub struct InMemoryBackend {
    collections: Arc<DashMap<String, StoredCollection>>,
    aliases: Arc<RwLock<BTreeMap<String, String>>>,
    next_id: Arc<AtomicU64>,
    requests: Arc<AtomicU64>,
}

#[derive(Clone)]
struct StoredCollection {
    metadata: CollectionMetadata,
    documents: BTreeMap<String, Value>,
}

impl StoredCollection {
    fn snapshot(&self) -> CollectionMetadata {
        CollectionMetadata {
            num_documents: self.documents.len() as u64,
            ..self.metadata.clone()
        }
    }
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of requests served so far
    pub fn request_count(&self) -> u64 {
        self.requests.load(AtomicOrdering::SeqCst)
    }

    fn record_request(&self) {
        self.requests.fetch_add(1, AtomicOrdering::SeqCst);
    }

    /// Concrete collection name for a collection or alias name
    fn resolve(&self, name: &str) -> Result<String> {
        if self.collections.contains_key(name) {
            return Ok(name.to_string());
        }
        self.aliases
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("Collection `{}` not found.", name)))
    }

    fn upsert_into(&self, stored: &mut StoredCollection, document: &Value) -> Result<Value> {
        validate_document(document, &stored.metadata.fields).map_err(Error::Validation)?;

        let mut document = document.clone();
        let id = match document.get("id").and_then(Value::as_str) {
            Some(id) => id.to_string(),
            None => {
                let id = self.next_id.fetch_add(1, AtomicOrdering::SeqCst).to_string();
                if let Value::Object(map) = &mut document {
                    map.insert("id".to_string(), Value::String(id.clone()));
                }
                id
            }
        };

        stored.documents.insert(id, document.clone());
        Ok(document)
    }

    fn run_search(&self, collection: &str, params: &SearchParams) -> Result<Value> {
        let name = self.resolve(collection)?;
        let stored = self
            .collections
            .get(&name)
            .ok_or_else(|| Error::NotFound(format!("Collection `{}` not found.", name)))?;

        let query = params.get("q").map(String::as_str).unwrap_or("*");
        let query_by = split_list(params.get("query_by"));
        let filters = parse_filters(params.get("filter_by").map(String::as_str).unwrap_or(""))?;

        let mut matched: Vec<&Value> = stored
            .documents
            .values()
            .filter(|doc| filters.iter().all(|filter| filter.matches(doc)))
            .filter(|doc| text_matches(doc, query, &query_by))
            .collect();

        if let Some((field, descending)) = params.get("sort_by").and_then(|s| first_sort(s)) {
            matched.sort_by(|a, b| {
                let ordering = compare_values(a.get(&field), b.get(&field));
                if descending {
                    ordering.reverse()
                } else {
                    ordering
                }
            });
        }

        let page = parse_number(params.get("page"), 1).max(1);
        let per_page = parse_number(params.get("per_page"), DEFAULT_PER_PAGE);
        let facet_counts = facet_counts(&matched, &split_list(params.get("facet_by")));
        let group_by = split_list(params.get("group_by"));

        let mut response = json!({
            "facet_counts": facet_counts,
            "out_of": stored.documents.len(),
            "page": page,
            "request_params": {
                "collection_name": name,
                "per_page": per_page,
                "q": query,
            },
            "search_time_ms": 0,
        });

        if group_by.is_empty() {
            let hits: Vec<Value> = paginate(&matched, page, per_page)
                .iter()
                .map(|doc| hit(doc))
                .collect();
            response["found"] = json!(matched.len());
            response["hits"] = Value::Array(hits);
        } else {
            let groups = group_documents(&matched, &group_by);
            let grouped: Vec<Value> = paginate(&groups, page, per_page)
                .iter()
                .map(|(key, docs)| {
                    json!({
                        "group_key": key,
                        "found": docs.len(),
                        "hits": docs.iter().map(|doc| hit(doc)).collect::<Vec<_>>(),
                    })
                })
                .collect();
            response["found"] = json!(groups.len());
            response["grouped_hits"] = Value::Array(grouped);
        }

        Ok(response)
    }
}

#[async_trait]
impl SearchBackend for InMemoryBackend {
    async fn create_collection(&self, schema: &Value) -> Result<CollectionMetadata> {
        self.record_request();

        let name = schema
            .get("name")
            .and_then(Value::as_str)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| Error::Validation("Parameter `name` is required.".to_string()))?
            .to_string();

        let fields: Vec<Field> = match schema.get("fields") {
            Some(fields) => serde_json::from_value(fields.clone())
                .map_err(|e| Error::Validation(format!("Bad field definitions: {}", e)))?,
            None => Vec::new(),
        };

        let string_list = |key: &str| -> Vec<String> {
            schema
                .get(key)
                .and_then(Value::as_array)
                .map(|items| {
                    items
                        .iter()
                        .filter_map(|item| item.as_str().map(str::to_string))
                        .collect()
                })
                .unwrap_or_default()
        };

        let metadata = CollectionMetadata {
            name: name.clone(),
            created_at: Utc::now().timestamp(),
            default_sorting_field: schema
                .get("default_sorting_field")
                .and_then(Value::as_str)
                .map(str::to_string),
            enable_nested_fields: schema
                .get("enable_nested_fields")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            fields,
            num_documents: 0,
            symbols_to_index: string_list("symbols_to_index"),
            token_separators: string_list("token_separators"),
        };

        match self.collections.entry(name.clone()) {
            Entry::Occupied(_) => Err(Error::NameConflict(format!(
                "A collection with name `{}` already exists.",
                name
            ))),
            Entry::Vacant(entry) => {
                entry.insert(StoredCollection {
                    metadata: metadata.clone(),
                    documents: BTreeMap::new(),
                });
                Ok(metadata)
            }
        }
    }

    async fn retrieve_collection(&self, name: &str) -> Result<CollectionMetadata> {
        self.record_request();
        let name = self.resolve(name)?;
        self.collections
            .get(&name)
            .map(|stored| stored.snapshot())
            .ok_or_else(|| Error::NotFound(format!("Collection `{}` not found.", name)))
    }

    async fn retrieve_collections(&self) -> Result<Vec<CollectionMetadata>> {
        self.record_request();
        let mut collections: Vec<CollectionMetadata> = self
            .collections
            .iter()
            .map(|entry| entry.value().snapshot())
            .collect();
        collections.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.name.cmp(&b.name)));
        Ok(collections)
    }

    async fn delete_collection(&self, name: &str) -> Result<CollectionMetadata> {
        self.record_request();
        self.collections
            .remove(name)
            .map(|(_, stored)| stored.snapshot())
            .ok_or_else(|| Error::NotFound(format!("Collection `{}` not found.", name)))
    }

    async fn upsert_document(&self, collection: &str, document: &Value) -> Result<Value> {
        self.record_request();
        let name = self.resolve(collection)?;
        let mut stored = self
            .collections
            .get_mut(&name)
            .ok_or_else(|| Error::NotFound(format!("Collection `{}` not found.", name)))?;
        self.upsert_into(&mut stored, document)
    }

    async fn delete_document(&self, collection: &str, id: &str) -> Result<Value> {
        self.record_request();
        let name = self.resolve(collection)?;
        let mut stored = self
            .collections
            .get_mut(&name)
            .ok_or_else(|| Error::NotFound(format!("Collection `{}` not found.", name)))?;
        stored
            .documents
            .remove(id)
            .ok_or_else(|| Error::NotFound(format!("Could not find a document with id: {}", id)))
    }

    async fn delete_documents(&self, collection: &str, filter_by: &str) -> Result<u64> {
        self.record_request();
        let filters = parse_filters(filter_by)?;
        if filters.is_empty() {
            return Err(Error::Validation(
                "Parameter `filter_by` must be provided.".to_string(),
            ));
        }

        let name = self.resolve(collection)?;
        let mut stored = self
            .collections
            .get_mut(&name)
            .ok_or_else(|| Error::NotFound(format!("Collection `{}` not found.", name)))?;

        let before = stored.documents.len();
        stored
            .documents
            .retain(|_, doc| !filters.iter().all(|filter| filter.matches(doc)));
        Ok((before - stored.documents.len()) as u64)
    }

    async fn import_documents(
        &self,
        collection: &str,
        documents: &[Value],
    ) -> Result<Vec<ImportOutcome>> {
        self.record_request();
        let name = self.resolve(collection)?;
        let mut stored = self
            .collections
            .get_mut(&name)
            .ok_or_else(|| Error::NotFound(format!("Collection `{}` not found.", name)))?;

        Ok(documents
            .iter()
            .map(|document| match self.upsert_into(&mut stored, document) {
                Ok(_) => ImportOutcome::ok(),
                Err(err) => ImportOutcome::failed(
                    validation_message(err),
                    document.to_string(),
                    400,
                ),
            })
            .collect())
    }

    async fn retrieve_alias(&self, name: &str) -> Result<AliasInfo> {
        self.record_request();
        self.aliases
            .read()
            .get(name)
            .map(|collection_name| AliasInfo {
                name: name.to_string(),
                collection_name: collection_name.clone(),
            })
            .ok_or_else(|| Error::NotFound(format!("Alias `{}` not found.", name)))
    }

    async fn retrieve_aliases(&self) -> Result<Vec<AliasInfo>> {
        self.record_request();
        Ok(self
            .aliases
            .read()
            .iter()
            .map(|(name, collection_name)| AliasInfo {
                name: name.clone(),
                collection_name: collection_name.clone(),
            })
            .collect())
    }

    async fn upsert_alias(&self, name: &str, collection_name: &str) -> Result<AliasInfo> {
        self.record_request();
        if !self.collections.contains_key(collection_name) {
            return Err(Error::NotFound(format!(
                "Collection `{}` not found.",
                collection_name
            )));
        }

        self.aliases
            .write()
            .insert(name.to_string(), collection_name.to_string());
        Ok(AliasInfo {
            name: name.to_string(),
            collection_name: collection_name.to_string(),
        })
    }

    async fn delete_alias(&self, name: &str) -> Result<AliasInfo> {
        self.record_request();
        self.aliases
            .write()
            .remove(name)
            .map(|collection_name| AliasInfo {
                name: name.to_string(),
                collection_name,
            })
            .ok_or_else(|| Error::NotFound(format!("Alias `{}` not found.", name)))
    }

    async fn search(&self, collection: &str, params: &SearchParams) -> Result<Value> {
        self.record_request();
        self.run_search(collection, params)
    }

    async fn multi_search(&self, searches: &[SearchParams]) -> Result<Vec<Value>> {
        self.record_request();
        Ok(searches
            .iter()
            .map(|params| {
                let collection = params.get("collection").map(String::as_str).unwrap_or("");
                self.run_search(collection, params).unwrap_or_else(|err| {
                    json!({ "error": err.to_string(), "code": 404 })
                })
            })
            .collect())
    }
}

fn validation_message(err: Error) -> String {
    match err {
        Error::Validation(message) => message,
        other => other.to_string(),
    }
}

fn validate_document(document: &Value, fields: &[Field]) -> std::result::Result<(), String> {
    let object = document
        .as_object()
        .ok_or_else(|| "Bad JSON: not a properly formed document.".to_string())?;

    if let Some(id) = object.get("id") {
        if !id.is_string() {
            return Err("Document's `id` field should be a string.".to_string());
        }
    }

    for field in fields.iter().filter(|field| !field.is_wildcard()) {
        match object.get(&field.name) {
            None | Some(Value::Null) => {
                if !field.is_optional() {
                    return Err(format!(
                        "Field `{}` has been declared in the schema, but is not found in the document.",
                        field.name
                    ));
                }
            }
            Some(value) => {
                if !matches_type(value, &field.field_type) {
                    return Err(format!(
                        "Field `{}` must be of type `{}`.",
                        field.name, field.field_type
                    ));
                }
            }
        }
    }

    Ok(())
}

fn matches_type(value: &Value, field_type: &str) -> bool {
    if let Some(element_type) = field_type.strip_suffix("[]") {
        return value
            .as_array()
            .map_or(false, |items| items.iter().all(|item| matches_type(item, element_type)));
    }

    match field_type {
        "string" => value.is_string(),
        "int32" | "int64" => value.is_i64() || value.is_u64(),
        "float" => value.is_number(),
        "bool" => value.is_boolean(),
        "object" => value.is_object(),
        _ => true,
    }
}

struct FilterClause {
    field: String,
    value: String,
    exact: bool,
}

impl FilterClause {
    fn matches(&self, document: &Value) -> bool {
        let Some(value) = document.get(&self.field) else {
            return false;
        };

        let candidates: Vec<&Value> = match value {
            Value::Array(items) => items.iter().collect(),
            other => vec![other],
        };

        candidates.iter().any(|candidate| {
            let text = as_text(candidate);
            if self.exact {
                text == self.value
            } else {
                text.to_lowercase().contains(&self.value.to_lowercase())
            }
        })
    }
}

fn parse_filters(filter_by: &str) -> Result<Vec<FilterClause>> {
    filter_by
        .split("&&")
        .map(str::trim)
        .filter(|clause| !clause.is_empty())
        .map(|clause| {
            let (field, value) = clause.split_once(':').ok_or_else(|| {
                Error::Validation(format!("Could not parse the filter query: {}", clause))
            })?;
            let value = value.trim();
            let (value, exact) = match value.strip_prefix('=') {
                Some(rest) => (rest.trim(), true),
                None => (value, false),
            };

            Ok(FilterClause {
                field: field.trim().to_string(),
                value: value.trim_matches('`').to_string(),
                exact,
            })
        })
        .collect()
}

fn text_matches(document: &Value, query: &str, query_by: &[String]) -> bool {
    if query.is_empty() || query == "*" {
        return true;
    }

    let needle = query.to_lowercase();
    let haystack: Vec<&Value> = if query_by.is_empty() {
        document
            .as_object()
            .map(|map| map.values().collect())
            .unwrap_or_default()
    } else {
        query_by.iter().filter_map(|field| document.get(field)).collect()
    };

    haystack.iter().any(|value| match value {
        Value::String(text) => text.to_lowercase().contains(&needle),
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .any(|text| text.to_lowercase().contains(&needle)),
        _ => false,
    })
}

fn first_sort(sort_by: &str) -> Option<(String, bool)> {
    let clause = sort_by.split(',').next()?.trim();
    let (field, direction) = clause.split_once(':').unwrap_or((clause, "asc"));
    if field.is_empty() || field.starts_with('_') {
        return None;
    }
    Some((field.to_string(), direction.eq_ignore_ascii_case("desc")))
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(a)), Some(Value::Number(b))) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(a), Some(b)) => as_text(a).cmp(&as_text(b)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn facet_counts(documents: &[&Value], facet_by: &[String]) -> Vec<Value> {
    facet_by
        .iter()
        .map(|facet| {
            let field = facet.split('(').next().unwrap_or(facet).trim();
            let mut counts: HashMap<String, u64> = HashMap::new();

            for document in documents {
                match document.get(field) {
                    Some(Value::Array(items)) => {
                        for item in items {
                            *counts.entry(as_text(item)).or_default() += 1;
                        }
                    }
                    Some(Value::Null) | None => {}
                    Some(value) => *counts.entry(as_text(value)).or_default() += 1,
                }
            }

            let mut counts: Vec<(String, u64)> = counts.into_iter().collect();
            counts.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

            json!({
                "field_name": field,
                "counts": counts
                    .into_iter()
                    .map(|(value, count)| json!({
                        "count": count,
                        "highlighted": value,
                        "value": value,
                    }))
                    .collect::<Vec<_>>(),
                "stats": { "total_values": documents.len() },
            })
        })
        .collect()
}

fn group_documents<'a>(documents: &[&'a Value], group_by: &[String]) -> Vec<(Vec<Value>, Vec<&'a Value>)> {
    let mut groups: Vec<(Vec<Value>, Vec<&'a Value>)> = Vec::new();

    for document in documents {
        let key: Vec<Value> = group_by
            .iter()
            .map(|field| document.get(field).cloned().unwrap_or(Value::Null))
            .collect();

        match groups.iter_mut().find(|(existing, _)| *existing == key) {
            Some((_, members)) => members.push(document),
            None => groups.push((key, vec![document])),
        }
    }

    groups
}

fn paginate<T>(items: &[T], page: usize, per_page: usize) -> &[T] {
    let start = (page - 1).saturating_mul(per_page).min(items.len());
    let end = start.saturating_add(per_page).min(items.len());
    &items[start..end]
}

fn hit(document: &Value) -> Value {
    json!({
        "document": document,
        "highlights": [],
        "text_match": 1,
    })
}

fn split_list(value: Option<&String>) -> Vec<String> {
    value
        .map(|list| {
            list.split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn parse_number(value: Option<&String>, default: usize) -> usize {
    value.and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn as_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema(name: &str) -> Value {
        json!({
            "name": name,
            "fields": [
                {"name": "title", "type": "string"},
                {"name": "year", "type": "int32", "facet": true, "optional": true}
            ]
        })
    }

    #[tokio::test]
    async fn test_create_conflict() {
        let backend = InMemoryBackend::new();
        backend.create_collection(&schema("posts@1")).await.unwrap();
        let err = backend.create_collection(&schema("posts@1")).await.unwrap_err();
        assert!(err.is_name_conflict());
    }

    #[tokio::test]
    async fn test_alias_resolves_collection() {
        let backend = InMemoryBackend::new();
        backend.create_collection(&schema("posts@1")).await.unwrap();
        backend.upsert_alias("posts", "posts@1").await.unwrap();

        let metadata = backend.retrieve_collection("posts").await.unwrap();
        assert_eq!(metadata.name, "posts@1");
    }

    #[tokio::test]
    async fn test_alias_to_missing_collection_fails() {
        let backend = InMemoryBackend::new();
        let err = backend.upsert_alias("posts", "posts@1").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_import_reports_row_failures() {
        let backend = InMemoryBackend::new();
        backend.create_collection(&schema("posts@1")).await.unwrap();

        let outcomes = backend
            .import_documents(
                "posts@1",
                &[
                    json!({"id": "1", "title": "hello"}),
                    json!({"id": "2", "title": 5}),
                    json!("invalid document"),
                ],
            )
            .await
            .unwrap();

        assert!(outcomes[0].success);
        assert!(!outcomes[1].success);
        assert!(!outcomes[2].success);
        assert_eq!(
            backend.retrieve_collection("posts@1").await.unwrap().num_documents,
            1
        );
    }

    #[tokio::test]
    async fn test_search_filters_sorts_and_paginates() {
        let backend = InMemoryBackend::new();
        backend.create_collection(&schema("posts@1")).await.unwrap();
        for (id, title, year) in [("1", "rust", 2015), ("2", "rust async", 2019), ("3", "go", 2012)] {
            backend
                .upsert_document("posts@1", &json!({"id": id, "title": title, "year": year}))
                .await
                .unwrap();
        }

        let params: SearchParams = [
            ("q", "rust"),
            ("query_by", "title"),
            ("sort_by", "year:desc"),
            ("per_page", "1"),
            ("facet_by", "year"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let response = backend.search("posts@1", &params).await.unwrap();
        assert_eq!(response["found"], 2);
        assert_eq!(response["out_of"], 3);
        assert_eq!(response["hits"][0]["document"]["id"], "2");
        assert_eq!(response["request_params"]["per_page"], 1);
        assert_eq!(response["facet_counts"][0]["counts"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_delete_by_filter() {
        let backend = InMemoryBackend::new();
        backend.create_collection(&schema("posts@1")).await.unwrap();
        for (id, year) in [("1", 2015), ("2", 2019)] {
            backend
                .upsert_document("posts@1", &json!({"id": id, "title": "t", "year": year}))
                .await
                .unwrap();
        }

        let deleted = backend.delete_documents("posts@1", "year:=2015").await.unwrap();
        assert_eq!(deleted, 1);
    }

    #[test]
    fn test_paginate_out_of_range() {
        let items = [1, 2, 3];
        assert_eq!(paginate(&items, 2, 2), &[3]);
        assert!(paginate(&items, 5, 2).is_empty());
    }
}
