//! The knowledge pipeline: ingest documents, answer questions, forget sources.

use futures::stream::{self, StreamExt};
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::answer::{synthesize_neighborhood, AnswerEngine};
use crate::config::{CortexConfig, PipelineConfig};
use crate::error::{CortexError, CortexResult};
use crate::ingestion::{merge_deltas, Chunker, GraphExtractor};
use crate::retrieval::VectorIndex;
use crate::retry::with_retry;
use crate::traits::{Embedder, GraphStore, Llm, VectorStore};
use crate::types::{GraphSnapshot, Relation};

use super::prompts::NO_RELEVANT_INFORMATION;
use super::types::{
    AnswerOutcome, AskRequest, AskResponse, ChunkFailure, ForgetReport, IngestReport,
    IngestRequest,
};

/// Builds a per-brain knowledge graph from text and answers questions over it.
///
/// Graph and vector stores are injected; nothing here is global. The two stores
/// are written independently and both keyed by `source_id`, so a partial
/// failure is repaired by re-ingesting or re-deleting the same source.
pub struct KnowledgePipeline {
    config: PipelineConfig,
    chunker: Chunker,
    extractor: GraphExtractor,
    answer_engine: AnswerEngine,
    index: VectorIndex,
    graph_store: Arc<dyn GraphStore>,
}

impl KnowledgePipeline {
    /// Create a pipeline from configuration and provider implementations.
    ///
    /// Use the factories in cortex-llm, cortex-embeddings, cortex-vector-stores
    /// and cortex-graph-stores to build the providers.
    pub fn new(
        config: &CortexConfig,
        llm: Arc<dyn Llm>,
        embedder: Arc<dyn Embedder>,
        vector_store: Arc<dyn VectorStore>,
        graph_store: Arc<dyn GraphStore>,
    ) -> CortexResult<Self> {
        config
            .pipeline
            .validate()
            .map_err(|msg| CortexError::Configuration(msg.to_string()))?;

        Ok(Self {
            config: config.pipeline.clone(),
            chunker: Chunker::new(&config.pipeline.chunking)?,
            extractor: GraphExtractor::new(llm.clone()),
            answer_engine: AnswerEngine::new(llm),
            index: VectorIndex::new(
                vector_store,
                embedder,
                config.vector_store.collection_prefix.clone(),
            ),
            graph_store,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// The vector index backing retrieval.
    pub fn vector_index(&self) -> &VectorIndex {
        &self.index
    }

    /// Chunk, extract, merge and persist one document.
    ///
    /// Chunks whose extraction fails are reported and skipped; the rest of the
    /// document is still persisted. Re-ingesting the same source is idempotent.
    pub async fn ingest(&self, request: IngestRequest) -> CortexResult<IngestReport> {
        request.validate()?;
        let IngestRequest {
            text,
            source_id,
            brain_id,
        } = request;

        let chunks = self.chunker.chunk(&text);
        info!(brain_id = %brain_id, source_id = %source_id, "Ingesting {} chunk(s)", chunks.len());

        let source = source_id.as_str();
        let pending: Vec<_> = chunks
            .iter()
            .enumerate()
            .map(|(index, chunk)| async move { (index, self.extractor.extract(chunk, source).await) })
            .collect();
        let mut extractions: Vec<_> = stream::iter(pending)
            .buffer_unordered(self.config.max_concurrent_extractions)
            .collect()
            .await;
        extractions.sort_by_key(|(index, _)| *index);

        let mut report = IngestReport {
            chunks: chunks.len(),
            ..Default::default()
        };
        let mut deltas = Vec::with_capacity(extractions.len());
        for (chunk_index, result) in extractions {
            match result {
                Ok(extraction) => {
                    report.rejected_relations.extend(extraction.rejected);
                    deltas.push(extraction.delta);
                }
                Err(error) => {
                    warn!(source_id = %source_id, "Extraction failed for chunk {}: {}", chunk_index, error);
                    report.failed_chunks.push(ChunkFailure { chunk_index, error });
                }
            }
        }

        let merged = merge_deltas(deltas);
        report.brain_id = brain_id;
        report.source_id = source_id;
        if merged.entities.is_empty() {
            info!(brain_id = %report.brain_id, "Nothing extracted from {}", report.source_id);
            return Ok(report);
        }

        let brain_id = report.brain_id.as_str();
        let retry = &self.config.retry;

        with_retry(retry, "ensure namespace", || self.index.ensure_namespace(brain_id)).await?;

        let outcome = with_retry(retry, "graph upsert", || {
            self.graph_store
                .upsert_graph(brain_id, &merged.entities, &merged.relations)
        })
        .await?;

        for rejected in &outcome.rejected {
            warn!(brain_id = %brain_id, "Graph store rejected relation {:?}: {}", rejected.relation, rejected.reason);
        }
        let refused: BTreeSet<&Relation> = outcome.rejected.iter().map(|r| &r.relation).collect();
        let persisted: Vec<Relation> = merged
            .relations
            .iter()
            .filter(|r| !refused.contains(r))
            .cloned()
            .collect();

        let vectors_indexed = with_retry(retry, "vector index", || {
            self.index.index(brain_id, &merged.entities)
        })
        .await?;

        info!(
            brain_id = %brain_id,
            "Ingested {}: {} entities, {} relations, {} vectors, {} failed chunk(s)",
            report.source_id,
            merged.entities.len(),
            persisted.len(),
            vectors_indexed,
            report.failed_chunks.len()
        );

        report.rejected_relations.extend(outcome.rejected.iter().cloned());
        report.graph = outcome;
        report.vectors_indexed = vectors_indexed;
        report.relations = persisted;
        report.entities = merged.entities;
        Ok(report)
    }

    /// Answer a question from the brain's graph.
    ///
    /// Empty retrieval is an outcome, not an error: the reply then says no
    /// relevant information was found and the LLM is not called.
    pub async fn ask(&self, request: AskRequest) -> CortexResult<AskResponse> {
        request.validate()?;
        let brain_id = request.brain_id.as_str();
        let question = request.question.as_str();
        let retry = &self.config.retry;
        let retrieval = &self.config.retrieval;

        if !with_retry(retry, "namespace check", || self.index.is_ready(brain_id)).await? {
            info!(brain_id = %brain_id, "No index for brain; nothing to retrieve");
            return Ok(no_information(Vec::new()));
        }

        let hits = with_retry(retry, "vector search", || {
            self.index.search_text(brain_id, question, retrieval)
        })
        .await?;

        let mut seen = HashSet::new();
        let retrieved: Vec<String> = hits
            .into_iter()
            .filter(|hit| seen.insert(hit.entity_name.clone()))
            .map(|hit| hit.entity_name)
            .collect();
        if retrieved.is_empty() {
            info!(brain_id = %brain_id, "Vector search found no entities");
            return Ok(no_information(retrieved));
        }

        let neighborhood = with_retry(retry, "neighborhood query", || {
            self.graph_store
                .query_neighborhood(brain_id, &retrieved, retrieval.hops)
        })
        .await?;
        if neighborhood.is_empty() {
            info!(brain_id = %brain_id, "Graph has no entities for {} retrieved name(s)", retrieved.len());
            return Ok(no_information(retrieved));
        }

        let schema = synthesize_neighborhood(&neighborhood);
        let answer = self.answer_engine.answer(&schema, question).await?;
        info!(
            brain_id = %brain_id,
            "Answered from {} retrieved entities, {} referenced",
            retrieved.len(),
            answer.referenced_entity_names.len()
        );

        Ok(AskResponse {
            answer: answer.text,
            referenced_nodes: answer.referenced_entity_names,
            retrieved_nodes: retrieved,
            outcome: AnswerOutcome::Answered,
        })
    }

    /// Remove everything a source contributed to both stores.
    ///
    /// Each store is attempted even when the other fails; failures are in
    /// the report rather than returned as an error.
    pub async fn forget_source(&self, brain_id: &str, source_id: &str) -> CortexResult<ForgetReport> {
        require_id("brain_id", brain_id)?;
        require_id("source_id", source_id)?;
        let retry = &self.config.retry;

        let mut report = ForgetReport {
            brain_id: brain_id.to_string(),
            source_id: source_id.to_string(),
            ..Default::default()
        };

        match with_retry(retry, "graph provenance delete", || {
            self.graph_store.delete_by_provenance(brain_id, source_id)
        })
        .await
        {
            Ok(deletion) => report.graph = Some(deletion),
            Err(e) => {
                warn!(brain_id = %brain_id, "Graph delete for source {} failed: {}", source_id, e);
                report.graph_error = Some(e.to_string());
            }
        }

        match with_retry(retry, "vector provenance delete", || {
            self.index.delete_by_provenance(brain_id, source_id)
        })
        .await
        {
            Ok(()) => report.vectors_removed = true,
            Err(e) => {
                warn!(brain_id = %brain_id, "Vector delete for source {} failed: {}", source_id, e);
                report.vector_error = Some(e.to_string());
            }
        }

        info!(
            brain_id = %brain_id,
            "Forgot source {} (succeeded: {})",
            source_id,
            report.succeeded()
        );
        Ok(report)
    }

    /// Drop a brain from both stores.
    pub async fn delete_brain(&self, brain_id: &str) -> CortexResult<()> {
        require_id("brain_id", brain_id)?;
        let retry = &self.config.retry;

        let graph = with_retry(retry, "graph tenant delete", || {
            self.graph_store.delete_tenant(brain_id)
        })
        .await;
        let vectors = with_retry(retry, "namespace delete", || {
            self.index.delete_namespace(brain_id)
        })
        .await;

        graph?;
        vectors?;
        info!(brain_id = %brain_id, "Deleted brain");
        Ok(())
    }

    /// Every entity and relation of a brain.
    pub async fn export_graph(&self, brain_id: &str) -> CortexResult<GraphSnapshot> {
        require_id("brain_id", brain_id)?;
        with_retry(&self.config.retry, "graph export", || {
            self.graph_store.export_graph(brain_id)
        })
        .await
    }

    /// Sources whose descriptions are most similar to `query`, best first.
    ///
    /// Each source appears once, at the rank of its best hit.
    pub async fn similar_sources(&self, brain_id: &str, query: &str) -> CortexResult<Vec<String>> {
        require_id("brain_id", brain_id)?;
        require_id("query", query)?;
        let retry = &self.config.retry;

        if !with_retry(retry, "namespace check", || self.index.is_ready(brain_id)).await? {
            return Err(CortexError::tenant_not_found(brain_id));
        }

        let hits = with_retry(retry, "vector search", || {
            self.index.search_text(brain_id, query, &self.config.retrieval)
        })
        .await?;

        let mut seen = HashSet::new();
        let sources: Vec<String> = hits
            .into_iter()
            .filter(|hit| seen.insert(hit.source_id.clone()))
            .map(|hit| hit.source_id)
            .collect();
        debug!(brain_id = %brain_id, "{} similar source(s)", sources.len());
        Ok(sources)
    }
}

fn require_id(field: &str, value: &str) -> CortexResult<()> {
    if value.trim().is_empty() {
        return Err(CortexError::missing_field(field));
    }
    Ok(())
}

fn no_information(retrieved: Vec<String>) -> AskResponse {
    AskResponse {
        answer: NO_RELEVANT_INFORMATION.to_string(),
        referenced_nodes: Vec::new(),
        retrieved_nodes: retrieved,
        outcome: AnswerOutcome::NoInformation,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::ingestion::ExtractionError;
    use crate::retry::RetryPolicy;
    use crate::test_support::{KeywordEmbedder, MemoryStore, ScriptedLlm};
    use crate::traits::MockGraphStore;
    use crate::types::{
        Description, Entity, EntityKey, Neighborhood, ProvenanceDeletion, ResolvedRelation,
        UpsertOutcome,
    };

    const PARIS_GRAPH: &str = r#"{
        "nodes": [
            {"label": "City", "name": "Paris", "description": "Capital of France"},
            {"label": "Country", "name": "France", "description": "A country in Europe"}
        ],
        "edges": [{"source": "Paris", "target": "France", "relation": "capital of"}]
    }"#;

    fn fast_config() -> CortexConfig {
        let mut config = CortexConfig::default();
        config.pipeline.retry = RetryPolicy {
            max_retries: 2,
            initial_delay_ms: 1,
            max_delay_ms: 2,
            multiplier: 1.0,
        };
        config
    }

    fn pipeline(llm: ScriptedLlm, graph: MockGraphStore) -> KnowledgePipeline {
        KnowledgePipeline::new(
            &fast_config(),
            Arc::new(llm),
            Arc::new(KeywordEmbedder),
            Arc::new(MemoryStore::default()),
            Arc::new(graph),
        )
        .unwrap()
    }

    fn accepting_graph() -> MockGraphStore {
        let mut graph = MockGraphStore::new();
        graph.expect_upsert_graph().returning(|_, entities, relations| {
            Ok(UpsertOutcome {
                entities_created: entities.len(),
                relations_created: relations.len(),
                ..Default::default()
            })
        });
        graph
    }

    fn paris_neighborhood() -> Neighborhood {
        let paris = Entity::new("Paris", "City", vec![Description::new("Capital of France", "doc-1")])
            .unwrap();
        let france = Entity::new(
            "France",
            "Country",
            vec![Description::new("A country in Europe", "doc-1")],
        )
        .unwrap();
        Neighborhood {
            seeds: vec![paris],
            neighbors: vec![france],
            relations: vec![ResolvedRelation {
                source: EntityKey::new("Paris", "City"),
                target: EntityKey::new("France", "Country"),
                relation: "capital of".to_string(),
            }],
        }
    }

    #[tokio::test]
    async fn test_ingest_rejects_empty_fields() {
        let pipeline = pipeline(ScriptedLlm::new([PARIS_GRAPH]), MockGraphStore::new());
        let err = pipeline
            .ingest(IngestRequest::new("text", "", "b1"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::ValMissingField);
    }

    #[tokio::test]
    async fn test_ingest_persists_graph_and_vectors() {
        let pipeline = pipeline(ScriptedLlm::new([PARIS_GRAPH]), accepting_graph());

        let report = pipeline
            .ingest(IngestRequest::new("Paris is the capital of France.", "doc-1", "b1"))
            .await
            .unwrap();

        assert_eq!(report.chunks, 1);
        assert_eq!(report.entities.len(), 2);
        assert_eq!(report.relations.len(), 1);
        assert!(report.failed_chunks.is_empty());
        assert_eq!(report.graph.entities_created, 2);
        assert_eq!(report.vectors_indexed, 6);
        assert_eq!(pipeline.vector_index().count("b1", Some("doc-1")).await.unwrap(), 6);
    }

    #[tokio::test]
    async fn test_ingest_reports_store_rejections() {
        let mut graph = MockGraphStore::new();
        graph.expect_upsert_graph().returning(|_, _, relations| {
            Ok(UpsertOutcome {
                entities_created: 2,
                rejected: relations
                    .iter()
                    .cloned()
                    .map(|r| crate::types::RejectedRelation::new(r, "unknown endpoint"))
                    .collect(),
                ..Default::default()
            })
        });
        let pipeline = pipeline(ScriptedLlm::new([PARIS_GRAPH]), graph);

        let report = pipeline
            .ingest(IngestRequest::new("Paris is the capital of France.", "doc-1", "b1"))
            .await
            .unwrap();
        assert!(report.relations.is_empty());
        assert_eq!(report.rejected_relations.len(), 1);
    }

    #[tokio::test]
    async fn test_malformed_extraction_is_reported_not_fatal() {
        let mut graph = MockGraphStore::new();
        graph.expect_upsert_graph().never();
        let pipeline = pipeline(ScriptedLlm::new(["not json at all"]), graph);

        let report = pipeline
            .ingest(IngestRequest::new("Some text.", "doc-1", "b1"))
            .await
            .unwrap();
        assert!(report.entities.is_empty());
        assert_eq!(report.failed_chunks.len(), 1);
        assert!(matches!(
            report.failed_chunks[0].error,
            ExtractionError::InvalidJson(_)
        ));
    }

    #[tokio::test]
    async fn test_transient_graph_failure_is_retried() {
        let mut graph = MockGraphStore::new();
        let mut attempts = 0;
        graph.expect_upsert_graph().times(2).returning(move |_, _, _| {
            attempts += 1;
            if attempts == 1 {
                Err(CortexError::graph_store_connection("connection reset"))
            } else {
                Ok(UpsertOutcome::default())
            }
        });
        let pipeline = pipeline(ScriptedLlm::new([PARIS_GRAPH]), graph);

        let report = pipeline
            .ingest(IngestRequest::new("Paris is the capital of France.", "doc-1", "b1"))
            .await
            .unwrap();
        assert_eq!(report.entities.len(), 2);
    }

    #[tokio::test]
    async fn test_ask_unknown_brain_has_no_information() {
        let llm = ScriptedLlm::new(["unused"]);
        let pipeline = pipeline(llm, MockGraphStore::new());

        let response = pipeline
            .ask(AskRequest::new("What is Paris?", "missing"))
            .await
            .unwrap();
        assert_eq!(response.outcome, AnswerOutcome::NoInformation);
        assert_eq!(response.answer, NO_RELEVANT_INFORMATION);
    }

    #[tokio::test]
    async fn test_ask_answers_from_neighborhood() {
        let llm = ScriptedLlm::new([
            PARIS_GRAPH,
            "Paris is the capital of France.\nEOF\n{\"referenced_nodes\": [\"City-Paris\", \"Country-France\"]}",
        ]);
        let mut graph = accepting_graph();
        graph
            .expect_query_neighborhood()
            .withf(|brain, names, hops| brain == "b1" && names.contains(&"Paris".to_string()) && *hops == 1)
            .returning(|_, _, _| Ok(paris_neighborhood()));
        let pipeline = pipeline(llm, graph);

        pipeline
            .ingest(IngestRequest::new("Paris is the capital of France.", "doc-1", "b1"))
            .await
            .unwrap();
        let response = pipeline
            .ask(AskRequest::new("What is Paris the capital of?", "b1"))
            .await
            .unwrap();

        assert_eq!(response.outcome, AnswerOutcome::Answered);
        assert!(response.answer.contains("Paris"));
        assert_eq!(response.referenced_nodes, vec!["Paris", "France"]);
        assert_eq!(response.retrieved_nodes[0], "Paris");
    }

    #[tokio::test]
    async fn test_ask_with_empty_neighborhood_skips_llm() {
        let llm = Arc::new(ScriptedLlm::new([PARIS_GRAPH]));
        let mut graph = accepting_graph();
        graph
            .expect_query_neighborhood()
            .returning(|_, _, _| Ok(Neighborhood::default()));
        let pipeline = KnowledgePipeline::new(
            &fast_config(),
            llm.clone(),
            Arc::new(KeywordEmbedder),
            Arc::new(MemoryStore::default()),
            Arc::new(graph),
        )
        .unwrap();

        pipeline
            .ingest(IngestRequest::new("Paris is the capital of France.", "doc-1", "b1"))
            .await
            .unwrap();
        let response = pipeline
            .ask(AskRequest::new("Paris?", "b1"))
            .await
            .unwrap();

        assert_eq!(response.outcome, AnswerOutcome::NoInformation);
        assert_eq!(llm.call_count(), 1);
    }

    #[tokio::test]
    async fn test_forget_source_reports_graph_failure() {
        let mut graph = accepting_graph();
        graph
            .expect_delete_by_provenance()
            .returning(|_, _| Err(CortexError::graph_store("constraint violated")));
        let pipeline = pipeline(ScriptedLlm::new([PARIS_GRAPH]), graph);

        pipeline
            .ingest(IngestRequest::new("Paris is the capital of France.", "doc-1", "b1"))
            .await
            .unwrap();
        let report = pipeline.forget_source("b1", "doc-1").await.unwrap();

        assert!(!report.succeeded());
        assert!(report.graph_error.is_some());
        assert!(report.vectors_removed);
        assert_eq!(pipeline.vector_index().count("b1", Some("doc-1")).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_forget_source_succeeds_in_both_stores() {
        let mut graph = MockGraphStore::new();
        graph.expect_delete_by_provenance().returning(|_, _| {
            Ok(ProvenanceDeletion {
                descriptions_removed: 2,
                ..Default::default()
            })
        });
        let pipeline = pipeline(ScriptedLlm::new([PARIS_GRAPH]), graph);

        let report = pipeline.forget_source("b1", "doc-1").await.unwrap();
        assert!(report.succeeded());
        assert_eq!(report.graph.unwrap().descriptions_removed, 2);
    }

    #[tokio::test]
    async fn test_delete_brain_surfaces_graph_error_after_both_attempts() {
        let mut graph = accepting_graph();
        graph
            .expect_delete_tenant()
            .times(1)
            .returning(|_| Err(CortexError::graph_store("read only")));
        let pipeline = pipeline(ScriptedLlm::new([PARIS_GRAPH]), graph);

        pipeline
            .ingest(IngestRequest::new("Paris is the capital of France.", "doc-1", "b1"))
            .await
            .unwrap();
        assert!(pipeline.delete_brain("b1").await.is_err());
        assert!(!pipeline.vector_index().is_ready("b1").await.unwrap());
    }

    #[tokio::test]
    async fn test_similar_sources_lists_each_source_once() {
        let pipeline = pipeline(ScriptedLlm::new([PARIS_GRAPH]), accepting_graph());
        for source in ["doc-1", "doc-2"] {
            pipeline
                .ingest(IngestRequest::new("Paris is the capital of France.", source, "b1"))
                .await
                .unwrap();
        }

        let mut sources = pipeline.similar_sources("b1", "Paris").await.unwrap();
        sources.sort();
        assert_eq!(sources, vec!["doc-1", "doc-2"]);
    }

    #[tokio::test]
    async fn test_similar_sources_requires_known_brain_and_query() {
        let pipeline = pipeline(ScriptedLlm::new([PARIS_GRAPH]), MockGraphStore::new());

        let err = pipeline.similar_sources("missing", "Paris").await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::NfTenant);
        let err = pipeline.similar_sources("b1", " ").await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::ValMissingField);
    }
}
