//! Grounded answer generation with reference extraction.
//!
//! The model answers in prose, writes the sentinel, then a JSON object
//! `{"referenced_nodes": [...]}` naming the entities it relied on. The
//! reference block is best effort: when it is missing or malformed the prose
//! is still returned, with no references.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

use crate::error::CortexResult;
use crate::pipeline::json_parser::{extract_json_object, remove_code_blocks};
use crate::pipeline::prompts::{answer_prompt, ANSWER_SENTINEL};
use crate::traits::{GenerationOptions, Llm};
use crate::types::Message;

/// A parsed answer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    pub text: String,
    pub referenced_entity_names: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ReferenceBlock {
    #[serde(default)]
    referenced_nodes: Vec<serde_json::Value>,
}

/// Asks the LLM to answer from schema text only.
pub struct AnswerEngine {
    llm: Arc<dyn Llm>,
}

impl AnswerEngine {
    pub fn new(llm: Arc<dyn Llm>) -> Self {
        Self { llm }
    }

    /// Answer `question` from `schema_text`.
    pub async fn answer(&self, schema_text: &str, question: &str) -> CortexResult<Answer> {
        let messages = vec![Message::user(answer_prompt(schema_text, question))];
        let options = GenerationOptions {
            temperature: Some(0.0),
            ..Default::default()
        };

        let response = self.llm.generate(&messages, Some(options)).await?;
        let answer = parse_answer(response.content_or_empty());
        tracing::debug!(
            "Answer references {} entities",
            answer.referenced_entity_names.len()
        );
        Ok(answer)
    }
}

/// Split a raw model reply into prose and referenced entity names.
pub fn parse_answer(raw: &str) -> Answer {
    let parts: Vec<&str> = raw.split(ANSWER_SENTINEL).collect();
    if parts.len() < 2 {
        return Answer {
            text: raw.trim().to_string(),
            referenced_entity_names: Vec::new(),
        };
    }

    let text = parts[0].trim().to_string();
    let referenced_entity_names = parts
        .last()
        .map(|block| parse_referenced_nodes(block))
        .unwrap_or_default();

    Answer {
        text,
        referenced_entity_names,
    }
}

fn parse_referenced_nodes(block: &str) -> Vec<String> {
    let cleaned = remove_code_blocks(block);
    let parsed: Option<ReferenceBlock> = serde_json::from_str(&cleaned).ok().or_else(|| {
        extract_json_object(&cleaned).and_then(|json| serde_json::from_str(json).ok())
    });

    let Some(block) = parsed else {
        tracing::warn!("Answer reference block is not valid JSON");
        return Vec::new();
    };

    let mut seen = HashSet::new();
    block
        .referenced_nodes
        .iter()
        .filter_map(|value| value.as_str())
        .map(strip_label_prefix)
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .filter(|name| seen.insert(name.to_string()))
        .map(str::to_string)
        .collect()
}

/// `"City-Paris"` becomes `"Paris"`; names without a hyphen are unchanged.
fn strip_label_prefix(name: &str) -> &str {
    name.split_once('-').map(|(_, rest)| rest).unwrap_or(name)
}
