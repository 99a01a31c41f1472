//! Prompt templates for extraction and answering.

/// Delimiter between the prose answer and the reference JSON.
pub const ANSWER_SENTINEL: &str = "EOF";

/// Text the model is told to emit when the schema cannot answer the question.
pub const NO_INFORMATION_ANSWER: &str = "The schema does not contain that information.";

/// Returned without calling the model when retrieval finds nothing.
pub const NO_RELEVANT_INFORMATION: &str =
    "No relevant information was found in this brain for the question.";

// ============================================================================
// Graph Extraction
// ============================================================================

/// System prompt for graph extraction.
pub fn graph_extraction_system_prompt() -> &'static str {
    "You are an expert at extracting structured nodes and edges from text. \
     The source and target of every edge must reference the name of a node."
}

/// User prompt asking for the `{nodes, edges}` document for one chunk.
pub fn graph_extraction_prompt(chunk: &str) -> String {
    format!(
        r#"Analyze the following text and extract nodes and edges.

Nodes are an array of objects shaped {{"label": string, "name": string, "description": string}}.
Edges are an array of objects shaped {{"source": string, "target": string, "relation": string}}.
The source and target of an edge must be the name of one of the nodes. Never use a document id.

The output must follow exactly this JSON format:
{{
  "nodes": [ ... ],
  "edges": [ ... ]
}}

Rules:
1. Turn every concept mentioned in the text into a node
2. Each description is one short sentence explaining only that node
3. If one long description mixes several concepts, split it into one node per concept
4. Do not add information that is not in the text
5. If nothing can be extracted, return empty arrays

Output JSON only.

Text: {chunk}"#
    )
}

// ============================================================================
// Answering
// ============================================================================

/// Prompt asking for a grounded answer followed by the reference block.
pub fn answer_prompt(schema_text: &str, question: &str) -> String {
    format!(
        r#"Using the schema and question below, answer in natural language only within what the schema states or what can be inferred from its connected relations.
If the schema holds even partial information, explain as much as it supports. Only when the schema is completely unrelated, output "{no_info}".
Never guess from general knowledge.

Schema:
{schema_text}

Question: {question}

Output format:
[a detailed answer to the question, or "{no_info}"]

{sentinel}
{{
  "referenced_nodes": ["node name 1", "node name 2", ...]
}}
List exactly the names of the nodes you used as a JSON array. Do not include labels, relations or descriptions."#,
        no_info = NO_INFORMATION_ANSWER,
        sentinel = ANSWER_SENTINEL,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extraction_prompt_embeds_chunk() {
        let prompt = graph_extraction_prompt("Paris is the capital of France.");
        assert!(prompt.contains("\"nodes\""));
        assert!(prompt.ends_with("Text: Paris is the capital of France."));
    }

    #[test]
    fn test_answer_prompt_carries_sentinel_and_schema() {
        let prompt = answer_prompt("City-Paris(capital) -> capital of -> Country-France()", "What?");
        assert!(prompt.contains("\nEOF\n"));
        assert!(prompt.contains("City-Paris(capital)"));
        assert!(prompt.contains("referenced_nodes"));
    }
}
