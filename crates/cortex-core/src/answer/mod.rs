//! Answering: schema synthesis and grounded answer generation.

mod engine;
mod schema;

pub use engine::{parse_answer, Answer, AnswerEngine};
pub use schema::{synthesize_neighborhood, synthesize_schema, NO_SCHEMA_FOUND};
