//! Payload filters for vector store queries and deletions.

use serde::{Deserialize, Serialize};

/// Filter operator for payload queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterOperator {
    /// Equal to.
    Eq(serde_json::Value),
    /// In list.
    In(Vec<serde_json::Value>),
}

/// A single filter condition on a payload field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterCondition {
    pub field: String,
    pub operator: FilterOperator,
}

impl FilterCondition {
    /// Whether a payload value satisfies this condition.
    pub fn matches(&self, value: Option<&serde_json::Value>) -> bool {
        match (&self.operator, value) {
            (FilterOperator::Eq(expected), Some(actual)) => expected == actual,
            (FilterOperator::In(options), Some(actual)) => options.contains(actual),
            (_, None) => false,
        }
    }
}

/// Composite filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Filter {
    /// Single condition.
    Condition(FilterCondition),
    /// AND of multiple filters.
    And(Vec<Filter>),
}

impl Filter {
    /// Create an equality filter.
    pub fn eq(field: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        Filter::Condition(FilterCondition {
            field: field.into(),
            operator: FilterOperator::Eq(value.into()),
        })
    }

    /// Create an in-list filter.
    pub fn in_list(field: impl Into<String>, values: Vec<serde_json::Value>) -> Self {
        Filter::Condition(FilterCondition {
            field: field.into(),
            operator: FilterOperator::In(values),
        })
    }

    /// Create an AND filter.
    pub fn and(filters: Vec<Filter>) -> Self {
        Filter::And(filters)
    }

    /// Evaluate the filter against a JSON payload.
    ///
    /// Backends without native filtering (the embedded store) use this directly.
    pub fn matches(&self, payload: &serde_json::Map<String, serde_json::Value>) -> bool {
        match self {
            Filter::Condition(cond) => cond.matches(payload.get(&cond.field)),
            Filter::And(filters) => filters.iter().all(|f| f.matches(payload)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_filter_matches_payload() {
        let payload = json!({"source_id": "doc-1", "view_index": 2});
        let payload = payload.as_object().unwrap();

        assert!(Filter::eq("source_id", "doc-1").matches(payload));
        assert!(!Filter::eq("source_id", "doc-2").matches(payload));
        assert!(Filter::in_list("view_index", vec![json!(1), json!(2)]).matches(payload));
        assert!(!Filter::eq("missing", "x").matches(payload));
        assert!(Filter::and(vec![
            Filter::eq("source_id", "doc-1"),
            Filter::eq("view_index", 2),
        ])
        .matches(payload));
    }
}
