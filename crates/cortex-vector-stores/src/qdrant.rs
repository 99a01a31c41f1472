//! Qdrant vector store implementation.

use async_trait::async_trait;
use std::collections::HashMap;

use cortex_core::error::{CortexError, CortexResult};
use cortex_core::traits::{
    DistanceMetric, VectorRecord, VectorSearchResult, VectorStore, VectorStoreConfig,
};
use cortex_core::types::{Filter, FilterCondition, FilterOperator};

use qdrant_client::qdrant::{
    condition::ConditionOneOf, point_id::PointIdOptions, r#match::MatchValue, value::Kind,
    Condition, CountPointsBuilder, CreateCollectionBuilder, DeletePointsBuilder, Distance,
    FieldCondition, Filter as QdrantFilter, ListValue, Match, PointId, PointStruct,
    RepeatedIntegers, RepeatedStrings, SearchPointsBuilder, Struct, UpsertPointsBuilder, Value,
    VectorParamsBuilder,
};
use qdrant_client::{Qdrant, QdrantError};

const DEFAULT_URL: &str = "http://localhost:6334";

/// Qdrant vector store, one Qdrant collection per brain.
pub struct QdrantVectorStore {
    client: Qdrant,
}

impl QdrantVectorStore {
    /// Create a new Qdrant vector store.
    ///
    /// Reads `url` (default `http://localhost:6334`) and `api_key` from the
    /// provider-specific section of the config.
    pub fn new(config: &VectorStoreConfig) -> CortexResult<Self> {
        let url = config.setting("url").unwrap_or(DEFAULT_URL);

        let mut builder = Qdrant::from_url(url);
        if let Some(key) = config.setting("api_key") {
            builder = builder.api_key(key);
        }
        let client = builder.build().map_err(|e| {
            CortexError::vector_store_connection(format!("Failed to create Qdrant client: {}", e))
        })?;

        tracing::debug!(url = %url, "Qdrant client created");
        Ok(Self { client })
    }

    fn distance_to_qdrant(metric: DistanceMetric) -> Distance {
        match metric {
            DistanceMetric::Cosine => Distance::Cosine,
            DistanceMetric::Euclidean => Distance::Euclid,
            DistanceMetric::DotProduct => Distance::Dot,
        }
    }

    fn qdrant_value_to_json(value: Value) -> serde_json::Value {
        match value.kind {
            Some(Kind::NullValue(_)) | None => serde_json::Value::Null,
            Some(Kind::BoolValue(b)) => serde_json::Value::Bool(b),
            Some(Kind::IntegerValue(i)) => serde_json::Value::Number(i.into()),
            Some(Kind::DoubleValue(d)) => serde_json::Number::from_f64(d)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Some(Kind::StringValue(s)) => serde_json::Value::String(s),
            Some(Kind::ListValue(list)) => serde_json::Value::Array(
                list.values
                    .into_iter()
                    .map(Self::qdrant_value_to_json)
                    .collect(),
            ),
            Some(Kind::StructValue(s)) => serde_json::Value::Object(
                s.fields
                    .into_iter()
                    .map(|(k, v)| (k, Self::qdrant_value_to_json(v)))
                    .collect(),
            ),
        }
    }

    fn json_to_qdrant_value(value: serde_json::Value) -> Value {
        let kind = match value {
            serde_json::Value::Null => Kind::NullValue(0),
            serde_json::Value::Bool(b) => Kind::BoolValue(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Kind::IntegerValue(i),
                None => n.as_f64().map(Kind::DoubleValue).unwrap_or(Kind::NullValue(0)),
            },
            serde_json::Value::String(s) => Kind::StringValue(s),
            serde_json::Value::Array(arr) => Kind::ListValue(ListValue {
                values: arr.into_iter().map(Self::json_to_qdrant_value).collect(),
            }),
            serde_json::Value::Object(obj) => Kind::StructValue(Struct {
                fields: obj
                    .into_iter()
                    .map(|(k, v)| (k, Self::json_to_qdrant_value(v)))
                    .collect(),
            }),
        };

        Value { kind: Some(kind) }
    }

    fn convert_filter(filter: &Filter) -> QdrantFilter {
        let must = match filter {
            Filter::Condition(cond) => vec![Self::convert_condition(cond)],
            Filter::And(filters) => filters
                .iter()
                .flat_map(|f| Self::convert_filter(f).must)
                .collect(),
        };
        QdrantFilter {
            must,
            ..Default::default()
        }
    }

    fn convert_condition(cond: &FilterCondition) -> Condition {
        let match_value = match &cond.operator {
            FilterOperator::Eq(value) => Self::value_to_match(value),
            FilterOperator::In(values) => {
                if values.iter().all(|v| v.is_i64()) {
                    Some(MatchValue::Integers(RepeatedIntegers {
                        integers: values.iter().filter_map(|v| v.as_i64()).collect(),
                    }))
                } else {
                    Some(MatchValue::Keywords(RepeatedStrings {
                        strings: values
                            .iter()
                            .filter_map(|v| v.as_str().map(str::to_string))
                            .collect(),
                    }))
                }
            }
        };

        Condition {
            condition_one_of: Some(ConditionOneOf::Field(FieldCondition {
                key: cond.field.clone(),
                r#match: Some(Match { match_value }),
                ..Default::default()
            })),
        }
    }

    fn value_to_match(value: &serde_json::Value) -> Option<MatchValue> {
        match value {
            serde_json::Value::String(s) => Some(MatchValue::Keyword(s.clone())),
            serde_json::Value::Number(n) => n.as_i64().map(MatchValue::Integer),
            serde_json::Value::Bool(b) => Some(MatchValue::Boolean(*b)),
            _ => None,
        }
    }

    fn extract_point_id(point_id: Option<PointId>) -> String {
        match point_id.and_then(|p| p.point_id_options) {
            Some(PointIdOptions::Uuid(uuid)) => uuid,
            Some(PointIdOptions::Num(num)) => num.to_string(),
            None => String::new(),
        }
    }

    /// Classify a client error: transport failures are retryable, the rest are not.
    fn map_error(context: &str, err: QdrantError) -> CortexError {
        let message = format!("{}: {}", context, err);
        let lowered = message.to_lowercase();
        if ["transport error", "unavailable", "deadline", "connection"]
            .iter()
            .any(|needle| lowered.contains(needle))
        {
            CortexError::vector_store_connection(message)
        } else {
            CortexError::vector_store(message)
        }
    }
}

#[async_trait]
impl VectorStore for QdrantVectorStore {
    async fn create_collection(
        &self,
        name: &str,
        dimension: usize,
        distance: DistanceMetric,
    ) -> CortexResult<()> {
        let request = CreateCollectionBuilder::new(name).vectors_config(
            VectorParamsBuilder::new(dimension as u64, Self::distance_to_qdrant(distance)),
        );

        self.client
            .create_collection(request)
            .await
            .map_err(|e| Self::map_error("Failed to create collection", e))?;

        tracing::debug!(collection = %name, "Created Qdrant collection");
        Ok(())
    }

    async fn collection_exists(&self, name: &str) -> CortexResult<bool> {
        self.client
            .collection_exists(name)
            .await
            .map_err(|e| Self::map_error("Failed to check collection", e))
    }

    async fn delete_collection(&self, name: &str) -> CortexResult<()> {
        if !self.collection_exists(name).await? {
            return Ok(());
        }
        self.client
            .delete_collection(name)
            .await
            .map_err(|e| Self::map_error("Failed to delete collection", e))?;
        Ok(())
    }

    async fn list_collections(&self) -> CortexResult<Vec<String>> {
        let collections = self
            .client
            .list_collections()
            .await
            .map_err(|e| Self::map_error("Failed to list collections", e))?;

        Ok(collections
            .collections
            .into_iter()
            .map(|c| c.name)
            .collect())
    }

    async fn upsert(&self, collection: &str, records: Vec<VectorRecord>) -> CortexResult<()> {
        if records.is_empty() {
            return Ok(());
        }
        let points: Vec<PointStruct> = records
            .into_iter()
            .map(|record| {
                let payload: HashMap<String, Value> = record
                    .payload
                    .into_iter()
                    .map(|(k, v)| (k, Self::json_to_qdrant_value(v)))
                    .collect();

                PointStruct::new(record.id, record.vector, payload)
            })
            .collect();

        self.client
            .upsert_points(UpsertPointsBuilder::new(collection, points).wait(true))
            .await
            .map_err(|e| Self::map_error("Failed to upsert vectors", e))?;

        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        query_vector: &[f32],
        limit: usize,
        filter: Option<Filter>,
    ) -> CortexResult<Vec<VectorSearchResult>> {
        let mut request =
            SearchPointsBuilder::new(collection, query_vector.to_vec(), limit as u64)
                .with_payload(true);

        if let Some(f) = filter {
            request = request.filter(Self::convert_filter(&f));
        }

        let search_result = self
            .client
            .search_points(request)
            .await
            .map_err(|e| Self::map_error("Failed to search vectors", e))?;

        Ok(search_result
            .result
            .into_iter()
            .map(|point| VectorSearchResult {
                id: Self::extract_point_id(point.id),
                score: point.score,
                payload: point
                    .payload
                    .into_iter()
                    .map(|(k, v)| (k, Self::qdrant_value_to_json(v)))
                    .collect(),
            })
            .collect())
    }

    async fn delete_by_filter(&self, collection: &str, filter: &Filter) -> CortexResult<()> {
        let request = DeletePointsBuilder::new(collection)
            .points(Self::convert_filter(filter))
            .wait(true);

        self.client
            .delete_points(request)
            .await
            .map_err(|e| Self::map_error("Failed to delete vectors", e))?;

        Ok(())
    }

    async fn count(&self, collection: &str, filter: Option<Filter>) -> CortexResult<u64> {
        let mut request = CountPointsBuilder::new(collection).exact(true);
        if let Some(f) = filter {
            request = request.filter(Self::convert_filter(&f));
        }

        let response = self
            .client
            .count(request)
            .await
            .map_err(|e| Self::map_error("Failed to count vectors", e))?;

        Ok(response.result.map(|r| r.count).unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_filter_becomes_keyword_match() {
        let filter = QdrantVectorStore::convert_filter(&Filter::eq("source_id", "doc-1"));
        assert_eq!(filter.must.len(), 1);
        match &filter.must[0].condition_one_of {
            Some(ConditionOneOf::Field(field)) => {
                assert_eq!(field.key, "source_id");
                assert_eq!(
                    field.r#match.as_ref().and_then(|m| m.match_value.clone()),
                    Some(MatchValue::Keyword("doc-1".to_string()))
                );
            }
            other => panic!("unexpected condition: {:?}", other),
        }
    }

    #[test]
    fn test_and_filter_flattens_into_must() {
        let filter = QdrantVectorStore::convert_filter(&Filter::and(vec![
            Filter::eq("brain_id", "b1"),
            Filter::eq("view_index", 2),
        ]));
        assert_eq!(filter.must.len(), 2);
    }

    #[test]
    fn test_payload_value_conversion() {
        let original = serde_json::json!({"name": "Paris", "view_index": 1, "tags": ["a", "b"]});
        let converted =
            QdrantVectorStore::qdrant_value_to_json(QdrantVectorStore::json_to_qdrant_value(
                original.clone(),
            ));
        assert_eq!(converted, original);
    }

    #[test]
    fn test_client_config_reads_url() {
        let config = VectorStoreConfig {
            config: serde_json::json!({"url": "http://qdrant.internal:6334"}),
            ..Default::default()
        };
        assert!(QdrantVectorStore::new(&config).is_ok());
    }
}
