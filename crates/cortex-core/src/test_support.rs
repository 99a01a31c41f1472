//! Deterministic fakes shared by unit tests.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use crate::error::{CortexError, CortexResult};
use crate::traits::{
    DistanceMetric, Embedder, EmbeddingAction, GenerationOptions, Llm, LlmResponse, VectorRecord,
    VectorSearchResult, VectorStore,
};
use crate::types::{Filter, Message};

/// Exact cosine search over an in-memory map.
#[derive(Default)]
pub struct MemoryStore {
    collections: Mutex<HashMap<String, HashMap<String, VectorRecord>>>,
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        0.0
    } else {
        dot / (na * nb)
    }
}

fn payload_map(
    payload: &HashMap<String, serde_json::Value>,
) -> serde_json::Map<String, serde_json::Value> {
    payload.clone().into_iter().collect()
}

#[async_trait]
impl VectorStore for MemoryStore {
    async fn create_collection(&self, name: &str, _: usize, _: DistanceMetric) -> CortexResult<()> {
        let mut cols = self.collections.lock().unwrap();
        if cols.contains_key(name) {
            return Err(CortexError::vector_store("exists"));
        }
        cols.insert(name.to_string(), HashMap::new());
        Ok(())
    }

    async fn collection_exists(&self, name: &str) -> CortexResult<bool> {
        Ok(self.collections.lock().unwrap().contains_key(name))
    }

    async fn delete_collection(&self, name: &str) -> CortexResult<()> {
        self.collections.lock().unwrap().remove(name);
        Ok(())
    }

    async fn list_collections(&self) -> CortexResult<Vec<String>> {
        Ok(self.collections.lock().unwrap().keys().cloned().collect())
    }

    async fn upsert(&self, collection: &str, records: Vec<VectorRecord>) -> CortexResult<()> {
        let mut cols = self.collections.lock().unwrap();
        let col = cols
            .get_mut(collection)
            .ok_or_else(|| CortexError::vector_store("missing collection"))?;
        for record in records {
            col.insert(record.id.clone(), record);
        }
        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        query: &[f32],
        limit: usize,
        filter: Option<Filter>,
    ) -> CortexResult<Vec<VectorSearchResult>> {
        let cols = self.collections.lock().unwrap();
        let col = cols
            .get(collection)
            .ok_or_else(|| CortexError::vector_store("missing collection"))?;
        let mut results: Vec<VectorSearchResult> = col
            .values()
            .filter(|r| filter.as_ref().map_or(true, |f| f.matches(&payload_map(&r.payload))))
            .map(|r| VectorSearchResult {
                id: r.id.clone(),
                score: cosine(query, &r.vector),
                payload: r.payload.clone(),
            })
            .collect();
        results.sort_by(|a, b| b.score.total_cmp(&a.score));
        results.truncate(limit);
        Ok(results)
    }

    async fn delete_by_filter(&self, collection: &str, filter: &Filter) -> CortexResult<()> {
        let mut cols = self.collections.lock().unwrap();
        if let Some(col) = cols.get_mut(collection) {
            col.retain(|_, r| !filter.matches(&payload_map(&r.payload)));
        }
        Ok(())
    }

    async fn count(&self, collection: &str, filter: Option<Filter>) -> CortexResult<u64> {
        let cols = self.collections.lock().unwrap();
        Ok(cols
            .get(collection)
            .map(|col| {
                col.values()
                    .filter(|r| filter.as_ref().map_or(true, |f| f.matches(&payload_map(&r.payload))))
                    .count() as u64
            })
            .unwrap_or(0))
    }
}

/// Embeds text as counts of a few marker words.
pub struct KeywordEmbedder;

const MARKERS: [&str; 4] = ["paris", "france", "louvre", "berlin"];

#[async_trait]
impl Embedder for KeywordEmbedder {
    async fn embed(&self, text: &str, _: Option<EmbeddingAction>) -> CortexResult<Vec<f32>> {
        let lower = text.to_lowercase();
        let mut v: Vec<f32> = MARKERS.iter().map(|m| lower.matches(m).count() as f32).collect();
        v.push(0.01);
        Ok(v)
    }

    fn dimension(&self) -> usize {
        MARKERS.len() + 1
    }

    fn model_name(&self) -> &str {
        "keyword"
    }
}

/// Replies with queued responses in order; once drained, repeats the last one.
pub struct ScriptedLlm {
    replies: Mutex<VecDeque<CortexResult<String>>>,
    last: Mutex<Option<String>>,
    pub calls: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedLlm {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(|r| Ok(r.into())).collect()),
            last: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            replies: Mutex::new(VecDeque::from([Err(CortexError::llm(message))])),
            last: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Llm for ScriptedLlm {
    async fn generate(
        &self,
        messages: &[Message],
        _: Option<GenerationOptions>,
    ) -> CortexResult<LlmResponse> {
        self.calls.lock().unwrap().push(messages.to_vec());
        let next = self.replies.lock().unwrap().pop_front();
        match next {
            Some(Ok(text)) => {
                *self.last.lock().unwrap() = Some(text.clone());
                Ok(LlmResponse::text(text))
            }
            Some(Err(e)) => Err(e),
            None => match self.last.lock().unwrap().clone() {
                Some(text) => Ok(LlmResponse::text(text)),
                None => Err(CortexError::llm("no scripted reply")),
            },
        }
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}
