//! Request and report types for the pipeline's external calls.

use serde::{Deserialize, Serialize};

use crate::error::{CortexError, CortexResult};
use crate::ingestion::ExtractionError;
use crate::types::{Entity, RejectedRelation, Relation, UpsertOutcome, ProvenanceDeletion};

fn require(field: &str, value: &str) -> CortexResult<()> {
    if value.trim().is_empty() {
        return Err(CortexError::missing_field(field));
    }
    Ok(())
}

/// Text to ingest into a brain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestRequest {
    pub text: String,
    pub source_id: String,
    pub brain_id: String,
}

impl IngestRequest {
    pub fn new(
        text: impl Into<String>,
        source_id: impl Into<String>,
        brain_id: impl Into<String>,
    ) -> Self {
        Self {
            text: text.into(),
            source_id: source_id.into(),
            brain_id: brain_id.into(),
        }
    }

    /// Reject empty fields.
    pub fn validate(&self) -> CortexResult<()> {
        require("text", &self.text)?;
        require("source_id", &self.source_id)?;
        require("brain_id", &self.brain_id)
    }
}

/// A chunk whose extraction produced nothing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkFailure {
    pub chunk_index: usize,
    pub error: ExtractionError,
}

/// What an ingestion did.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestReport {
    pub brain_id: String,
    pub source_id: String,
    pub chunks: usize,
    /// Merged entities written to the graph.
    pub entities: Vec<Entity>,
    /// Relations written to the graph.
    pub relations: Vec<Relation>,
    /// Relations rejected during extraction or by the store.
    pub rejected_relations: Vec<RejectedRelation>,
    pub failed_chunks: Vec<ChunkFailure>,
    /// Graph-side counters.
    pub graph: UpsertOutcome,
    /// Vector records written (views of descriptions).
    pub vectors_indexed: usize,
}

/// A question about one brain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskRequest {
    pub question: String,
    pub brain_id: String,
}

impl AskRequest {
    pub fn new(question: impl Into<String>, brain_id: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            brain_id: brain_id.into(),
        }
    }

    /// Reject empty fields.
    pub fn validate(&self) -> CortexResult<()> {
        require("question", &self.question)?;
        require("brain_id", &self.brain_id)
    }
}

/// How an answer was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerOutcome {
    /// The LLM answered from retrieved schema.
    Answered,
    /// Retrieval found nothing; the LLM was not called.
    NoInformation,
}

/// Answer to a question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskResponse {
    pub answer: String,
    /// Entity names the answer says it relied on.
    pub referenced_nodes: Vec<String>,
    /// Entity names vector search retrieved, best first.
    pub retrieved_nodes: Vec<String>,
    pub outcome: AnswerOutcome,
}

/// What removing a source did in each store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ForgetReport {
    pub brain_id: String,
    pub source_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub graph: Option<ProvenanceDeletion>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub graph_error: Option<String>,
    pub vectors_removed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vector_error: Option<String>,
}

impl ForgetReport {
    /// Whether both stores dropped the source.
    pub fn succeeded(&self) -> bool {
        self.graph_error.is_none() && self.vector_error.is_none()
    }
}
