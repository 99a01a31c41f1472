//! LLM-based graph extraction.
//!
//! The model is asked for a `{"nodes": [...], "edges": [...]}` document. Its
//! reply is parsed strictly and then validated:
//!
//! 1. Unparseable or wrongly shaped replies fail the whole chunk
//! 2. Nodes without a `name` or `label` are dropped and logged
//! 3. Edges must name validated nodes of the same reply; the rest are
//!    reported as rejected relations
//!
//! Nothing here looks at the stored graph; merging happens later.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;

use crate::pipeline::json_parser::remove_code_blocks;
use crate::pipeline::prompts::{graph_extraction_prompt, graph_extraction_system_prompt};
use crate::traits::{GenerationOptions, Llm, ResponseFormat};
use crate::types::{Description, Entity, ExtractionDelta, Message, RejectedRelation, Relation};

/// Why a chunk produced nothing.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExtractionError {
    #[error("LLM returned an empty response")]
    EmptyResponse,
    #[error("response is not valid JSON: {0}")]
    InvalidJson(String),
    #[error("response has the wrong shape: {0}")]
    MalformedShape(String),
    #[error("LLM call failed: {0}")]
    Llm(String),
}

/// Validated output for one chunk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChunkExtraction {
    pub delta: ExtractionDelta,
    /// Edges that failed validation.
    pub rejected: Vec<RejectedRelation>,
    /// Nodes dropped for missing identity fields.
    pub dropped_nodes: usize,
}

mod raw {
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    pub struct RawNode {
        pub label: Option<String>,
        pub name: Option<String>,
        pub description: Option<String>,
    }

    #[derive(Debug, Deserialize)]
    pub struct RawEdge {
        pub source: Option<String>,
        pub target: Option<String>,
        pub relation: Option<String>,
    }
}

/// Turns one chunk of text into a validated graph fragment.
pub struct GraphExtractor {
    llm: Arc<dyn Llm>,
}

impl GraphExtractor {
    pub fn new(llm: Arc<dyn Llm>) -> Self {
        Self { llm }
    }

    /// Extract a graph fragment from `chunk`, tagging every description with `source_id`.
    pub async fn extract(
        &self,
        chunk: &str,
        source_id: &str,
    ) -> Result<ChunkExtraction, ExtractionError> {
        if chunk.trim().is_empty() {
            return Ok(ChunkExtraction::default());
        }

        let messages = vec![
            Message::system(graph_extraction_system_prompt()),
            Message::user(graph_extraction_prompt(chunk)),
        ];
        let options = GenerationOptions {
            temperature: Some(0.0),
            max_tokens: Some(5000),
            response_format: self
                .llm
                .supports_json_mode()
                .then_some(ResponseFormat::Json),
            ..Default::default()
        };

        let response = self
            .llm
            .generate(&messages, Some(options))
            .await
            .map_err(|e| ExtractionError::Llm(e.to_string()))?;

        parse_graph_document(response.content_or_empty(), source_id)
    }
}

/// Parse and validate a `{nodes, edges}` document.
pub fn parse_graph_document(
    content: &str,
    source_id: &str,
) -> Result<ChunkExtraction, ExtractionError> {
    let cleaned = remove_code_blocks(content);
    if cleaned.is_empty() {
        return Err(ExtractionError::EmptyResponse);
    }

    let document: serde_json::Value =
        serde_json::from_str(&cleaned).map_err(|e| ExtractionError::InvalidJson(e.to_string()))?;
    let object = document
        .as_object()
        .ok_or_else(|| ExtractionError::MalformedShape("expected a JSON object".to_string()))?;

    let raw_nodes = array_field(object, "nodes")?;
    let raw_edges = array_field(object, "edges")?;

    let mut result = ChunkExtraction::default();

    for value in raw_nodes {
        match validate_node(value, source_id) {
            Some(entity) => result.delta.entities.push(entity),
            None => {
                tracing::warn!("Dropping node with missing fields: {}", value);
                result.dropped_nodes += 1;
            }
        }
    }

    let names: HashSet<&str> = result
        .delta
        .entities
        .iter()
        .map(|e| e.name.as_str())
        .collect();

    let mut relations = Vec::new();
    for value in raw_edges {
        match validate_edge(value, &names) {
            Ok(relation) => relations.push(relation),
            Err(rejected) => {
                tracing::warn!(
                    "Rejecting edge {} -[{}]-> {}: {}",
                    rejected.relation.source,
                    rejected.relation.relation,
                    rejected.relation.target,
                    rejected.reason
                );
                result.rejected.push(rejected);
            }
        }
    }
    result.delta.relations = relations;

    Ok(result)
}

fn array_field<'a>(
    object: &'a serde_json::Map<String, serde_json::Value>,
    field: &str,
) -> Result<&'a [serde_json::Value], ExtractionError> {
    match object.get(field) {
        None | Some(serde_json::Value::Null) => Ok(&[]),
        Some(serde_json::Value::Array(items)) => Ok(items.as_slice()),
        Some(_) => Err(ExtractionError::MalformedShape(format!(
            "'{}' must be an array",
            field
        ))),
    }
}

fn validate_node(value: &serde_json::Value, source_id: &str) -> Option<Entity> {
    let node: raw::RawNode = serde_json::from_value(value.clone()).ok()?;
    let description = node.description.unwrap_or_default().trim().to_string();
    Entity::new(
        node.name?,
        node.label?,
        vec![Description::new(description, source_id)],
    )
    .ok()
}

fn validate_edge(
    value: &serde_json::Value,
    names: &HashSet<&str>,
) -> Result<Relation, RejectedRelation> {
    let edge: raw::RawEdge = serde_json::from_value(value.clone()).map_err(|e| {
        RejectedRelation::new(
            Relation {
                source: String::new(),
                target: String::new(),
                relation: String::new(),
            },
            format!("edge is not an object of strings: {}", e),
        )
    })?;

    let partial = Relation {
        source: edge.source.clone().unwrap_or_default(),
        target: edge.target.clone().unwrap_or_default(),
        relation: edge.relation.clone().unwrap_or_default(),
    };

    let relation = Relation::new(
        partial.source.clone(),
        partial.target.clone(),
        partial.relation.clone(),
    )
    .map_err(|e| RejectedRelation::new(partial, format!("missing field: {}", e)))?;

    let unknown = [&relation.source, &relation.target]
        .into_iter()
        .find(|name| !names.contains(name.as_str()))
        .cloned();

    match unknown {
        Some(endpoint) => {
            let reason = format!("'{}' is not a node of this extraction", endpoint);
            Err(RejectedRelation::new(relation, reason))
        }
        None => Ok(relation),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CortexError, CortexResult};
    use crate::traits::LlmResponse;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct ScriptedLlm {
        reply: CortexResult<String>,
        last_options: Mutex<Option<GenerationOptions>>,
    }

    impl ScriptedLlm {
        fn replying(text: &str) -> Self {
            Self {
                reply: Ok(text.to_string()),
                last_options: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl Llm for ScriptedLlm {
        async fn generate(
            &self,
            _: &[Message],
            options: Option<GenerationOptions>,
        ) -> CortexResult<LlmResponse> {
            *self.last_options.lock().unwrap() = options;
            match &self.reply {
                Ok(text) => Ok(LlmResponse::text(text.clone())),
                Err(e) => Err(CortexError::llm(e.to_string())),
            }
        }

        fn model_name(&self) -> &str {
            "scripted"
        }
    }

    const PARIS: &str = r#"{
        "nodes": [
            {"label": "City", "name": "Paris", "description": "Capital of France"},
            {"label": "Country", "name": "France", "description": "A country in Europe"}
        ],
        "edges": [
            {"source": "Paris", "target": "France", "relation": "capital of"}
        ]
    }"#;

    #[test]
    fn test_parse_valid_document() {
        let result = parse_graph_document(PARIS, "doc-1").unwrap();
        assert_eq!(result.delta.entities.len(), 2);
        assert_eq!(result.delta.relations.len(), 1);
        assert!(result.rejected.is_empty());

        let paris = &result.delta.entities[0];
        assert_eq!(paris.key().to_string(), "City-Paris");
        assert_eq!(paris.descriptions, vec![Description::new("Capital of France", "doc-1")]);
    }

    #[test]
    fn test_parse_fenced_document() {
        let fenced = format!("```json\n{}\n```", PARIS);
        let result = parse_graph_document(&fenced, "doc-1").unwrap();
        assert_eq!(result.delta.entities.len(), 2);
    }

    #[test]
    fn test_invalid_json_fails_closed() {
        let err = parse_graph_document("{\"nodes\": [", "doc-1").unwrap_err();
        assert!(matches!(err, ExtractionError::InvalidJson(_)));

        let err = parse_graph_document("   ", "doc-1").unwrap_err();
        assert_eq!(err, ExtractionError::EmptyResponse);
    }

    #[test]
    fn test_wrong_shape_fails_closed() {
        let err = parse_graph_document("[1, 2, 3]", "doc-1").unwrap_err();
        assert!(matches!(err, ExtractionError::MalformedShape(_)));

        let err = parse_graph_document(r#"{"nodes": "Paris"}"#, "doc-1").unwrap_err();
        assert!(matches!(err, ExtractionError::MalformedShape(_)));
    }

    #[test]
    fn test_missing_arrays_are_empty() {
        let result = parse_graph_document("{}", "doc-1").unwrap();
        assert!(result.delta.is_empty());
    }

    #[test]
    fn test_nodes_missing_identity_are_dropped() {
        let doc = r#"{"nodes": [
            {"name": "Paris", "description": "no label"},
            {"label": "City", "description": "no name"},
            {"label": "City", "name": "Lyon"}
        ]}"#;
        let result = parse_graph_document(doc, "doc-1").unwrap();
        assert_eq!(result.dropped_nodes, 2);
        assert_eq!(result.delta.entities.len(), 1);
        assert_eq!(result.delta.entities[0].descriptions[0].text, "");
    }

    #[test]
    fn test_edges_to_unknown_nodes_are_rejected() {
        let doc = r#"{
            "nodes": [{"label": "City", "name": "Paris", "description": "a city"}],
            "edges": [
                {"source": "Paris", "target": "Atlantis", "relation": "near"},
                {"source": "Paris", "relation": "alone"}
            ]
        }"#;
        let result = parse_graph_document(doc, "doc-1").unwrap();
        assert!(result.delta.relations.is_empty());
        assert_eq!(result.rejected.len(), 2);
        assert!(result.rejected[0].reason.contains("Atlantis"));
        assert!(result.rejected[1].reason.contains("missing field"));
    }

    #[tokio::test]
    async fn test_extract_requests_json_at_zero_temperature() {
        let llm = Arc::new(ScriptedLlm::replying(PARIS));
        let extractor = GraphExtractor::new(llm.clone());

        let result = extractor.extract("Paris is the capital of France.", "doc-1").await.unwrap();
        assert_eq!(result.delta.entities.len(), 2);

        let options = llm.last_options.lock().unwrap().clone().unwrap();
        assert_eq!(options.temperature, Some(0.0));
        assert_eq!(options.response_format, Some(ResponseFormat::Json));
    }

    #[tokio::test]
    async fn test_extract_llm_failure_is_reported() {
        let llm = Arc::new(ScriptedLlm {
            reply: Err(CortexError::llm("boom")),
            last_options: Mutex::new(None),
        });
        let extractor = GraphExtractor::new(llm);

        let err = extractor.extract("some text", "doc-1").await.unwrap_err();
        assert!(matches!(err, ExtractionError::Llm(_)));
    }

    #[tokio::test]
    async fn test_extract_blank_chunk_skips_llm() {
        let llm = Arc::new(ScriptedLlm::replying("not json"));
        let extractor = GraphExtractor::new(llm.clone());

        let result = extractor.extract("   ", "doc-1").await.unwrap();
        assert!(result.delta.is_empty());
        assert!(llm.last_options.lock().unwrap().is_none());
    }
}
