//! Pipeline module - ingestion and question answering over one brain.

pub(crate) mod json_parser;
mod main;
pub mod prompts;
mod types;

pub use json_parser::{extract_json_object, remove_code_blocks};
pub use main::KnowledgePipeline;
pub use types::{
    AnswerOutcome, AskRequest, AskResponse, ChunkFailure, ForgetReport, IngestReport,
    IngestRequest,
};
