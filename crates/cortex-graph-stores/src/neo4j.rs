//! Neo4j graph store implementation.
//!
//! Entities are `(:Entity {brain_id, name, label, key})` nodes with
//! `(:Description {text, source_id})` children; relations are
//! `[:RELATES {relation}]` edges. Writes of one call run in one transaction.

use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use neo4rs::{query, ConfigBuilder, Graph, Query, Row, Txn};

use cortex_core::error::{CortexError, CortexResult};
use cortex_core::traits::{GraphStore, GraphStoreConfig};
use cortex_core::types::{
    Description, Entity, EntityKey, GraphSnapshot, Neighborhood, ProvenanceDeletion,
    RejectedRelation, Relation, ResolvedRelation, UpsertOutcome,
};

/// Neo4j graph store implementation.
pub struct Neo4jGraphStore {
    graph: Graph,
}

/// Decode a string column, treating null as `None`.
fn column(row: &Row, name: &str) -> CortexResult<Option<String>> {
    row.get::<Option<String>>(name).map_err(|e| {
        CortexError::graph_store(format!("Failed to decode column '{}': {}", name, e))
    })
}

fn count(row: &Row, name: &str) -> CortexResult<usize> {
    row.get::<i64>(name)
        .map(|n| n.max(0) as usize)
        .map_err(|e| CortexError::graph_store(format!("Failed to decode column '{}': {}", name, e)))
}

/// Run a query inside `txn` and collect its rows.
async fn txn_rows(txn: &mut Txn, q: Query) -> CortexResult<Vec<Row>> {
    let mut stream = txn
        .execute(q)
        .await
        .map_err(|e| map_error("Failed to run query", e))?;
    let mut rows = Vec::new();
    while let Some(row) = stream
        .next(txn.handle())
        .await
        .map_err(|e| map_error("Failed to fetch row", e))?
    {
        rows.push(row);
    }
    Ok(rows)
}

/// Keys a relation query is limited to.
struct RelationScope {
    /// Every reached entity.
    reached: Vec<String>,
    /// Entities at least one endpoint must belong to.
    inner: Vec<String>,
}

fn map_error(context: &str, err: neo4rs::Error) -> CortexError {
    let message = format!("{}: {}", context, err);
    let lowered = message.to_lowercase();
    if ["connection", "io error", "timed out", "unavailable"]
        .iter()
        .any(|needle| lowered.contains(needle))
    {
        CortexError::graph_store_connection(message)
    } else {
        CortexError::graph_store(message)
    }
}

impl Neo4jGraphStore {
    /// Connect to Neo4j.
    pub async fn new(config: &GraphStoreConfig) -> CortexResult<Self> {
        let username = config.username.clone().unwrap_or_else(|| "neo4j".to_string());
        let password = config.password.clone().unwrap_or_default();

        let mut builder = ConfigBuilder::default()
            .uri(config.url.as_str())
            .user(username.as_str())
            .password(password.as_str());
        if let Some(db) = &config.database {
            builder = builder.db(db.as_str());
        }
        let neo_config = builder
            .build()
            .map_err(|e| map_error("Invalid Neo4j configuration", e))?;

        let graph = Graph::connect(neo_config)
            .await
            .map_err(|e| map_error("Failed to connect to Neo4j", e))?;

        tracing::debug!(url = %config.url, "Connected to Neo4j");
        Ok(Self { graph })
    }

    /// Run a read query and collect its rows.
    async fn rows(&self, q: Query) -> CortexResult<Vec<Row>> {
        let mut result = self
            .graph
            .execute(q)
            .await
            .map_err(|e| map_error("Failed to query graph", e))?;

        let mut rows = Vec::new();
        while let Some(row) = result
            .next()
            .await
            .map_err(|e| map_error("Failed to fetch row", e))?
        {
            rows.push(row);
        }
        Ok(rows)
    }

    /// Run a read query and collect string columns that may be null.
    async fn fetch_nullable(
        &self,
        q: Query,
        columns: &[&str],
    ) -> CortexResult<Vec<Vec<Option<String>>>> {
        self.rows(q)
            .await?
            .iter()
            .map(|row| columns.iter().map(|c| column(row, c)).collect())
            .collect()
    }

    /// Run a read query and collect string columns that must be present.
    async fn fetch(&self, q: Query, columns: &[&str]) -> CortexResult<Vec<Vec<String>>> {
        self.fetch_nullable(q, columns)
            .await?
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .zip(columns)
                    .map(|(value, c)| {
                        value.ok_or_else(|| {
                            CortexError::graph_store(format!("Column '{}' is null", c))
                        })
                    })
                    .collect()
            })
            .collect()
    }

    /// Run write queries in one transaction.
    async fn write(&self, queries: Vec<Query>) -> CortexResult<()> {
        if queries.is_empty() {
            return Ok(());
        }
        let mut txn = self
            .graph
            .start_txn()
            .await
            .map_err(|e| map_error("Failed to start transaction", e))?;
        if let Err(e) = txn.run_queries(queries).await {
            let _ = txn.rollback().await;
            return Err(map_error("Failed to write graph", e));
        }
        txn.commit()
            .await
            .map_err(|e| map_error("Failed to commit transaction", e))
    }

    /// Entities of a brain with the given keys, descriptions in storage order.
    async fn load_entities(
        &self,
        brain_id: &str,
        keys: Option<Vec<String>>,
    ) -> CortexResult<Vec<Entity>> {
        let q = query(
            r#"
            MATCH (e:Entity {brain_id: $brain_id})
            WHERE $all OR e.key IN $keys
            OPTIONAL MATCH (e)-[:HAS_DESCRIPTION]->(d:Description)
            WITH e, d ORDER BY d.seq
            RETURN e.name AS name, e.label AS label, d.text AS text, d.source_id AS source_id
            "#,
        )
        .param("brain_id", brain_id)
        .param("all", keys.is_none())
        .param("keys", keys.unwrap_or_default());

        let rows = self
            .fetch_nullable(q, &["name", "label", "text", "source_id"])
            .await?;
        let mut grouped: BTreeMap<EntityKey, Vec<Description>> = BTreeMap::new();
        for row in rows {
            let (name, label) = required_key(&row)?;
            let descriptions = grouped.entry(EntityKey::new(name, label)).or_default();
            if let (Some(text), Some(source_id)) = (&row[2], &row[3]) {
                descriptions.push(Description::new(text.clone(), source_id.clone()));
            }
        }

        Ok(grouped
            .into_iter()
            .map(|(key, descriptions)| Entity {
                name: key.name,
                label: key.label,
                descriptions,
            })
            .collect())
    }

    async fn load_relations(
        &self,
        brain_id: &str,
        scope: Option<RelationScope>,
    ) -> CortexResult<Vec<ResolvedRelation>> {
        let (all, reached, inner) = match scope {
            Some(scope) => (false, scope.reached, scope.inner),
            None => (true, Vec::new(), Vec::new()),
        };
        let q = query(
            r#"
            MATCH (a:Entity {brain_id: $brain_id})-[r:RELATES]->(b:Entity {brain_id: $brain_id})
            WHERE $all
               OR (a.key IN $inner AND b.key IN $reached)
               OR (b.key IN $inner AND a.key IN $reached)
            RETURN a.name AS sn, a.label AS sl, b.name AS tn, b.label AS tl, r.relation AS relation
            "#,
        )
        .param("brain_id", brain_id)
        .param("all", all)
        .param("reached", reached)
        .param("inner", inner);

        let mut relations: Vec<ResolvedRelation> = self
            .fetch(q, &["sn", "sl", "tn", "tl", "relation"])
            .await?
            .into_iter()
            .map(|row| ResolvedRelation {
                source: EntityKey::new(row[0].clone(), row[1].clone()),
                target: EntityKey::new(row[2].clone(), row[3].clone()),
                relation: row[4].clone(),
            })
            .collect();
        relations.sort();
        Ok(relations)
    }

    /// Remove a source's descriptions and prune emptied entities, counting
    /// what goes within the same transaction.
    async fn cascade_source(
        txn: &mut Txn,
        brain_id: &str,
        source_id: &str,
    ) -> CortexResult<ProvenanceDeletion> {
        let mut deletion = ProvenanceDeletion::default();

        let removed = txn_rows(
            txn,
            query(
                r#"
                MATCH (:Entity {brain_id: $brain_id})-[:HAS_DESCRIPTION]->(d:Description {source_id: $source_id})
                DETACH DELETE d
                RETURN count(*) AS removed
                "#,
            )
            .param("brain_id", brain_id)
            .param("source_id", source_id),
        )
        .await?;
        if let Some(row) = removed.first() {
            deletion.descriptions_removed = count(row, "removed")?;
        }

        let orphans = txn_rows(
            txn,
            query(
                r#"
                MATCH (e:Entity {brain_id: $brain_id})
                WHERE NOT (e)-[:HAS_DESCRIPTION]->()
                RETURN e.name AS name, e.label AS label
                "#,
            )
            .param("brain_id", brain_id),
        )
        .await?;
        for row in &orphans {
            let name = column(row, "name")?;
            let label = column(row, "label")?;
            if let (Some(name), Some(label)) = (name, label) {
                deletion.entities_removed.push(EntityKey::new(name, label));
            }
        }
        deletion.entities_removed.sort();
        if deletion.entities_removed.is_empty() {
            return Ok(deletion);
        }

        let relations = txn_rows(
            txn,
            query(
                r#"
                MATCH (a:Entity {brain_id: $brain_id})-[r:RELATES]->(b:Entity)
                WHERE NOT (a)-[:HAS_DESCRIPTION]->() OR NOT (b)-[:HAS_DESCRIPTION]->()
                RETURN count(r) AS removed
                "#,
            )
            .param("brain_id", brain_id),
        )
        .await?;
        if let Some(row) = relations.first() {
            deletion.relations_removed = count(row, "removed")?;
        }

        txn.run(
            query(
                r#"
                MATCH (e:Entity {brain_id: $brain_id})
                WHERE NOT (e)-[:HAS_DESCRIPTION]->()
                DETACH DELETE e
                "#,
            )
            .param("brain_id", brain_id),
        )
        .await
        .map_err(|e| map_error("Failed to prune entities", e))?;

        Ok(deletion)
    }
}

/// Name and label of an entity row; both are always set on stored entities.
fn required_key(row: &[Option<String>]) -> CortexResult<(String, String)> {
    match (&row[0], &row[1]) {
        (Some(name), Some(label)) if !name.trim().is_empty() && !label.trim().is_empty() => {
            Ok((name.clone(), label.clone()))
        }
        _ => Err(CortexError::graph_store(
            "Stored entity is missing its name or label",
        )),
    }
}

#[async_trait]
impl GraphStore for Neo4jGraphStore {
    async fn upsert_graph(
        &self,
        brain_id: &str,
        entities: &[Entity],
        relations: &[Relation],
    ) -> CortexResult<UpsertOutcome> {
        // Existing state decides the counts and the endpoint fallback.
        let mut names: Vec<String> = entities.iter().map(|e| e.name.clone()).collect();
        names.extend(relations.iter().flat_map(|r| [r.source.clone(), r.target.clone()]));
        let existing = self
            .fetch_nullable(
                query(
                    r#"
                    MATCH (e:Entity {brain_id: $brain_id}) WHERE e.name IN $names
                    OPTIONAL MATCH (e)-[:HAS_DESCRIPTION]->(d:Description)
                    RETURN e.name AS name, e.label AS label,
                           d.text AS text, d.source_id AS source_id
                    ORDER BY e.created
                    "#,
                )
                .param("brain_id", brain_id)
                .param("names", names),
                &["name", "label", "text", "source_id"],
            )
            .await?;

        let mut stored: HashMap<EntityKey, HashSet<(String, String)>> = HashMap::new();
        let mut oldest_by_name: HashMap<String, EntityKey> = HashMap::new();
        for row in existing {
            let (name, label) = required_key(&row)?;
            let key = EntityKey::new(name.clone(), label);
            oldest_by_name.entry(name).or_insert_with(|| key.clone());
            let descriptions = stored.entry(key).or_default();
            if let (Some(text), Some(source_id)) = (&row[2], &row[3]) {
                descriptions.insert((text.clone(), source_id.clone()));
            }
        }

        let mut outcome = UpsertOutcome::default();
        let mut queries = Vec::new();
        let mut batch: HashMap<&str, EntityKey> = HashMap::new();

        for entity in entities {
            let key = entity.key();
            let known = stored.get(&key);
            let added: Vec<&Description> = entity
                .descriptions
                .iter()
                .filter(|d| {
                    known.map_or(true, |s| {
                        !s.contains(&(d.text.clone(), d.source_id.clone()))
                    })
                })
                .collect();

            match known {
                None => outcome.entities_created += 1,
                Some(_) if !added.is_empty() => outcome.entities_updated += 1,
                Some(_) => {}
            }
            outcome.descriptions_added += added.len();

            queries.push(
                query(
                    r#"
                    MERGE (e:Entity {brain_id: $brain_id, name: $name, label: $label})
                    ON CREATE SET e.key = $key, e.created = timestamp()
                    "#,
                )
                .param("brain_id", brain_id)
                .param("name", entity.name.as_str())
                .param("label", entity.label.as_str())
                .param("key", key.to_string()),
            );
            for description in added {
                queries.push(
                    query(
                        r#"
                        MATCH (e:Entity {brain_id: $brain_id, name: $name, label: $label})
                        MERGE (e)-[:HAS_DESCRIPTION]->(d:Description {text: $text, source_id: $source_id})
                        ON CREATE SET d.seq = timestamp()
                        "#,
                    )
                    .param("brain_id", brain_id)
                    .param("name", entity.name.as_str())
                    .param("label", entity.label.as_str())
                    .param("text", description.text.as_str())
                    .param("source_id", description.source_id.as_str()),
                );
            }
            batch.entry(entity.name.as_str()).or_insert(key);
        }

        let mut resolved = Vec::new();
        for relation in relations {
            let resolve = |name: &str| {
                batch
                    .get(name)
                    .cloned()
                    .or_else(|| oldest_by_name.get(name).cloned())
            };
            let (source, target) = match (resolve(&relation.source), resolve(&relation.target)) {
                (Some(s), Some(t)) => (s, t),
                (None, _) => {
                    outcome.rejected.push(RejectedRelation::new(
                        relation.clone(),
                        format!("source entity '{}' not found in brain", relation.source),
                    ));
                    continue;
                }
                (_, None) => {
                    outcome.rejected.push(RejectedRelation::new(
                        relation.clone(),
                        format!("target entity '{}' not found in brain", relation.target),
                    ));
                    continue;
                }
            };

            resolved.push(ResolvedRelation {
                source,
                target,
                relation: relation.relation.clone(),
            });
        }

        if !resolved.is_empty() {
            let endpoint_keys: Vec<String> = resolved
                .iter()
                .flat_map(|r| [r.source.to_string(), r.target.to_string()])
                .collect();
            let scope = RelationScope {
                reached: endpoint_keys.clone(),
                inner: endpoint_keys,
            };
            let known: HashSet<ResolvedRelation> = self
                .load_relations(brain_id, Some(scope))
                .await?
                .into_iter()
                .collect();
            let fresh: HashSet<&ResolvedRelation> =
                resolved.iter().filter(|r| !known.contains(*r)).collect();
            outcome.relations_created = fresh.len();
        }
        for relation in &resolved {
            queries.push(
                query(
                    r#"
                    MATCH (a:Entity {brain_id: $brain_id, key: $source}),
                          (b:Entity {brain_id: $brain_id, key: $target})
                    MERGE (a)-[:RELATES {relation: $relation}]->(b)
                    "#,
                )
                .param("brain_id", brain_id)
                .param("source", relation.source.to_string())
                .param("target", relation.target.to_string())
                .param("relation", relation.relation.as_str()),
            );
        }

        self.write(queries).await?;

        for rejected in &outcome.rejected {
            tracing::warn!(brain_id = %brain_id, "Rejected relation: {}", rejected.reason);
        }
        Ok(outcome)
    }

    async fn query_neighborhood(
        &self,
        brain_id: &str,
        names: &[String],
        hops: usize,
    ) -> CortexResult<Neighborhood> {
        let seed_rows = self
            .fetch(
                query(
                    "MATCH (e:Entity {brain_id: $brain_id}) WHERE e.name IN $names RETURN e.key AS key",
                )
                .param("brain_id", brain_id)
                .param("names", names.to_vec()),
                &["key"],
            )
            .await?;
        let seed_keys: HashSet<String> = seed_rows.into_iter().map(|mut r| r.remove(0)).collect();
        if seed_keys.is_empty() {
            return Ok(Neighborhood::default());
        }

        // Shortest distance from any seed; seeds themselves sit at 0.
        let mut depth: HashMap<String, usize> =
            seed_keys.iter().map(|k| (k.clone(), 0)).collect();
        if hops > 0 {
            // Variable-length bounds cannot be parameters.
            let cypher = format!(
                "MATCH p = (s:Entity {{brain_id: $brain_id}})-[:RELATES*1..{}]-(m:Entity {{brain_id: $brain_id}}) \
                 WHERE s.key IN $keys RETURN m.key AS key, min(length(p)) AS depth",
                hops
            );
            let reached = self
                .rows(
                    query(&cypher)
                        .param("brain_id", brain_id)
                        .param("keys", seed_keys.iter().cloned().collect::<Vec<_>>()),
                )
                .await?;
            for row in &reached {
                let key = column(row, "key")?
                    .ok_or_else(|| CortexError::graph_store("Reached entity has no key"))?;
                let d = count(row, "depth")?;
                depth.entry(key).and_modify(|v| *v = (*v).min(d)).or_insert(d);
            }
        }

        let key_list: Vec<String> = depth.keys().cloned().collect();
        let inner: Vec<String> = depth
            .iter()
            .filter(|(_, d)| **d < hops)
            .map(|(k, _)| k.clone())
            .collect();
        let entities = self.load_entities(brain_id, Some(key_list.clone())).await?;
        let relations = self
            .load_relations(
                brain_id,
                Some(RelationScope {
                    reached: key_list,
                    inner,
                }),
            )
            .await?;

        let (seeds, neighbors) = entities
            .into_iter()
            .partition(|e| seed_keys.contains(&e.key().to_string()));
        Ok(Neighborhood {
            seeds,
            neighbors,
            relations,
        })
    }

    async fn delete_by_provenance(
        &self,
        brain_id: &str,
        source_id: &str,
    ) -> CortexResult<ProvenanceDeletion> {
        let mut txn = self
            .graph
            .start_txn()
            .await
            .map_err(|e| map_error("Failed to start transaction", e))?;

        match Self::cascade_source(&mut txn, brain_id, source_id).await {
            Ok(deletion) => {
                txn.commit()
                    .await
                    .map_err(|e| map_error("Failed to commit transaction", e))?;
                Ok(deletion)
            }
            Err(e) => {
                let _ = txn.rollback().await;
                Err(e)
            }
        }
    }

    async fn delete_tenant(&self, brain_id: &str) -> CortexResult<()> {
        self.write(vec![query(
            r#"
            MATCH (e:Entity {brain_id: $brain_id})
            OPTIONAL MATCH (e)-[:HAS_DESCRIPTION]->(d:Description)
            DETACH DELETE d, e
            "#,
        )
        .param("brain_id", brain_id)])
        .await
    }

    async fn export_graph(&self, brain_id: &str) -> CortexResult<GraphSnapshot> {
        Ok(GraphSnapshot {
            entities: self.load_entities(brain_id, None).await?,
            relations: self.load_relations(brain_id, None).await?,
        })
    }
}
