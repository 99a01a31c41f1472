//! Ingest a document and ask about it through the embedded backends.

mod common;

use std::sync::Arc;

use cortex_core::{AnswerOutcome, AskRequest, IngestRequest};
use tokio_test::{assert_err, assert_ok};

use common::{pipeline, ScriptedLlm, PARIS_ANSWER, PARIS_GRAPH};

const DOCUMENT: &str = "Paris is the capital of France.";

#[tokio::test]
async fn test_ingest_then_ask_references_paris_and_france() {
    let llm = Arc::new(ScriptedLlm::new([PARIS_GRAPH, PARIS_ANSWER]));
    let pipeline = pipeline(llm.clone());

    let report = pipeline
        .ingest(IngestRequest::new(DOCUMENT, "doc-1", "brain-1"))
        .await
        .unwrap();
    assert_eq!(report.entities.len(), 2);
    assert_eq!(report.relations.len(), 1);
    assert!(report.failed_chunks.is_empty());
    assert!(report.rejected_relations.is_empty());

    let response = pipeline
        .ask(AskRequest::new("What is Paris the capital of?", "brain-1"))
        .await
        .unwrap();

    assert_eq!(response.outcome, AnswerOutcome::Answered);
    assert!(response.answer.contains("Paris"));
    assert!(response.referenced_nodes.contains(&"Paris".to_string()));
    assert!(response.referenced_nodes.contains(&"France".to_string()));
    assert_eq!(response.retrieved_nodes[0], "Paris");
    assert_eq!(llm.call_count(), 2);
}

#[tokio::test]
async fn test_ingest_twice_is_idempotent() {
    let llm = Arc::new(ScriptedLlm::new([PARIS_GRAPH]));
    let pipeline = pipeline(llm);

    let first = pipeline
        .ingest(IngestRequest::new(DOCUMENT, "doc-1", "brain-1"))
        .await
        .unwrap();
    let second = pipeline
        .ingest(IngestRequest::new(DOCUMENT, "doc-1", "brain-1"))
        .await
        .unwrap();

    assert_eq!(first.graph.entities_created, 2);
    assert_eq!(second.graph.entities_created, 0);
    assert_eq!(second.graph.relations_created, 0);
    assert_eq!(first.vectors_indexed, second.vectors_indexed);

    let snapshot = pipeline.export_graph("brain-1").await.unwrap();
    assert_eq!(snapshot.entities.len(), 2);
    assert_eq!(snapshot.relations.len(), 1);
    assert_eq!(snapshot.entities[0].descriptions.len(), 1);
}

#[tokio::test]
async fn test_ask_unknown_brain_has_no_information() {
    let llm = Arc::new(ScriptedLlm::new([PARIS_GRAPH]));
    let pipeline = pipeline(llm.clone());

    let response = pipeline
        .ask(AskRequest::new("What is Paris?", "empty-brain"))
        .await
        .unwrap();

    assert_eq!(response.outcome, AnswerOutcome::NoInformation);
    assert!(response.referenced_nodes.is_empty());
    assert_eq!(llm.call_count(), 0);
}

#[tokio::test]
async fn test_forget_one_of_two_sources_keeps_the_other() {
    let llm = Arc::new(ScriptedLlm::new([PARIS_GRAPH]));
    let pipeline = pipeline(llm);

    for source in ["doc-1", "doc-2"] {
        pipeline
            .ingest(IngestRequest::new(DOCUMENT, source, "brain-1"))
            .await
            .unwrap();
    }

    let report = pipeline.forget_source("brain-1", "doc-1").await.unwrap();
    assert!(report.succeeded());
    let snapshot = pipeline.export_graph("brain-1").await.unwrap();
    assert_eq!(snapshot.entities.len(), 2);
    assert!(snapshot
        .entities
        .iter()
        .all(|e| e.descriptions.iter().all(|d| d.source_id == "doc-2")));

    let report = pipeline.forget_source("brain-1", "doc-2").await.unwrap();
    assert!(report.succeeded());
    let snapshot = pipeline.export_graph("brain-1").await.unwrap();
    assert!(snapshot.entities.is_empty());
    assert!(snapshot.relations.is_empty());
}

#[tokio::test]
async fn test_delete_brain_leaves_other_brains() {
    let llm = Arc::new(ScriptedLlm::new([PARIS_GRAPH]));
    let pipeline = pipeline(llm);

    for brain in ["brain-1", "brain-2"] {
        pipeline
            .ingest(IngestRequest::new(DOCUMENT, "doc-1", brain))
            .await
            .unwrap();
    }

    assert_ok!(pipeline.delete_brain("brain-1").await);
    assert_err!(pipeline.delete_brain(" ").await);

    assert!(pipeline.export_graph("brain-1").await.unwrap().entities.is_empty());
    assert_eq!(pipeline.export_graph("brain-2").await.unwrap().entities.len(), 2);
}
