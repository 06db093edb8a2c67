use super::query::Search;
use super::results::Results;
use crate::client::SearchBackend;
use crate::error::{Error, Result};
use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use tracing::debug;

/// Run several searches in one request; results follow input order.
///
/// An empty input sends nothing.
pub async fn multi(backend: &dyn SearchBackend, searches: &[Search]) -> Result<Vec<Results>> {
    if searches.is_empty() {
        return Ok(Vec::new());
    }

    let compiled: Vec<_> = searches.iter().map(Search::compile).collect();
    debug!(searches = compiled.len(), "Executing multi-search");

    let responses = backend.multi_search(&compiled).await?;
    if responses.len() != compiled.len() {
        return Err(Error::Transport(format!(
            "multi-search returned {} results for {} searches",
            responses.len(),
            compiled.len()
        )));
    }

    Ok(responses.into_iter().map(Results::new).collect())
}

/// Keyed variant of [`multi`]; the result map has exactly the input keys.
///
/// A repeated key is InvalidArgument and nothing is sent.
pub async fn multi_named<K, I>(backend: &dyn SearchBackend, searches: I) -> Result<HashMap<K, Results>>
where
    K: Eq + Hash,
    I: IntoIterator<Item = (K, Search)>,
{
    let (keys, searches): (Vec<K>, Vec<Search>) = searches.into_iter().unzip();
    let mut seen = HashSet::with_capacity(keys.len());
    if let Some(position) = keys.iter().position(|key| !seen.insert(key)) {
        return Err(Error::InvalidArgument(format!(
            "multi-search key at position {} repeats an earlier key",
            position
        )));
    }
    let results = multi(backend, &searches).await?;
    Ok(keys.into_iter().zip(results).collect())
}

impl Search {
    /// [`multi`] using the backend of the first search
    pub async fn multi(searches: &[Search]) -> Result<Vec<Results>> {
        match searches.first() {
            Some(first) => multi(first.backend().as_ref(), searches).await,
            None => Ok(Vec::new()),
        }
    }
}
