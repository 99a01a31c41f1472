//! Ingestion: chunking, graph extraction and cross-chunk merging.
//!
//! Text flows through these stages in order:
//! - [`Chunker`] splits long documents into overlapping windows
//! - [`GraphExtractor`] asks the LLM for a graph fragment per chunk and
//!   validates it, failing closed per chunk
//! - [`merge_deltas`] folds the fragments into one delta

mod chunker;
mod extractor;
mod merger;

pub use chunker::{Chunker, ChunkingConfig};
pub use extractor::{parse_graph_document, ChunkExtraction, ExtractionError, GraphExtractor};
pub use merger::merge_deltas;
