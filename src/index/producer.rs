use crate::error::Result;
use futures::stream::{self, BoxStream, StreamExt};
use serde_json::{json, Value};
use std::sync::Arc;

/// Maps record ids to the documents stored for them.
///
/// Each id may yield zero or more documents. The stream is consumed lazily,
/// one import batch at a time; an `Err` item stops population.
pub trait DocumentProducer: Send + Sync {
    fn produce(&self, ids: Vec<String>) -> BoxStream<'static, Result<Value>>;
}

/// Yields `{"id": id}` for every id
#[derive(Debug, Clone, Copy, Default)]
pub struct IdDocuments;

impl DocumentProducer for IdDocuments {
    fn produce(&self, ids: Vec<String>) -> BoxStream<'static, Result<Value>> {
        stream::iter(ids.into_iter().map(|id| Ok(json!({ "id": id })))).boxed()
    }
}

/// One document per id from a synchronous mapping function
pub struct MapDocuments<F> {
    map: Arc<F>,
}

impl<F> MapDocuments<F>
where
    F: Fn(String) -> Result<Value> + Send + Sync + 'static,
{
    pub fn new(map: F) -> Self {
        Self { map: Arc::new(map) }
    }
}

impl<F> DocumentProducer for MapDocuments<F>
where
    F: Fn(String) -> Result<Value> + Send + Sync + 'static,
{
    fn produce(&self, ids: Vec<String>) -> BoxStream<'static, Result<Value>> {
        let map = Arc::clone(&self.map);
        stream::iter(ids).map(move |id| map(id)).boxed()
    }
}

impl<P: DocumentProducer + ?Sized> DocumentProducer for Arc<P> {
    fn produce(&self, ids: Vec<String>) -> BoxStream<'static, Result<Value>> {
        (**self).produce(ids)
    }
}
