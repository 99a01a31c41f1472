//! SQLite <-> petgraph synchronization.
//!
//! Writes run inside one SQLite transaction and return what they changed, so
//! the caller can patch the mirror only after the commit succeeded.

use std::collections::HashMap;

use rusqlite::{params, Connection, OptionalExtension, Transaction};

use cortex_core::error::CortexResult;
use cortex_core::types::{Description, Entity, EntityKey, RejectedRelation, Relation};

use super::petgraph_ops::{EntityNode, GraphMirror, RelationEdge};

/// Load the entire graph from SQLite into the mirror.
///
/// Called on startup to hydrate the in-memory graph.
pub fn load_graph(conn: &Connection, mirror: &mut GraphMirror) -> CortexResult<()> {
    let mut nodes: HashMap<i64, EntityNode> = HashMap::new();

    let mut stmt = conn.prepare("SELECT id, brain_id, name, label FROM entities ORDER BY id")?;
    let rows = stmt.query_map([], |row| {
        Ok(EntityNode::new(
            row.get(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
        ))
    })?;
    let mut order = Vec::new();
    for row in rows {
        let node = row?;
        order.push(node.db_id);
        nodes.insert(node.db_id, node);
    }

    let mut stmt =
        conn.prepare("SELECT entity_id, text, source_id FROM descriptions ORDER BY id")?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            Description::new(row.get::<_, String>(1)?, row.get::<_, String>(2)?),
        ))
    })?;
    for row in rows {
        let (entity_id, description) = row?;
        if let Some(node) = nodes.get_mut(&entity_id) {
            node.descriptions.push(description);
        }
    }

    for id in order {
        if let Some(node) = nodes.remove(&id) {
            mirror.merge_entity(node);
        }
    }

    let mut stmt = conn.prepare(
        "SELECT id, source_entity, target_entity, relation FROM relations ORDER BY id",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, i64>(1)?,
            row.get::<_, i64>(2)?,
            RelationEdge {
                db_id: row.get(0)?,
                relation: row.get(3)?,
            },
        ))
    })?;
    for row in rows {
        let (source, target, edge) = row?;
        mirror.add_relation(source, target, edge);
    }

    Ok(())
}

/// Changes made by [`write_batch`].
#[derive(Debug, Default)]
pub struct BatchWrites {
    /// Touched entities, each carrying only the descriptions newly stored.
    pub entities: Vec<EntityNode>,
    pub entities_created: usize,
    pub entities_updated: usize,
    pub descriptions_added: usize,
    /// Newly created relations as `(source db id, target db id, edge)`.
    pub relations: Vec<(i64, i64, RelationEdge)>,
    pub rejected: Vec<RejectedRelation>,
}

fn entity_id_by_key(
    tx: &Transaction<'_>,
    brain_id: &str,
    name: &str,
    label: &str,
) -> CortexResult<Option<i64>> {
    Ok(tx
        .query_row(
            "SELECT id FROM entities WHERE brain_id = ?1 AND name = ?2 AND label = ?3",
            params![brain_id, name, label],
            |row| row.get(0),
        )
        .optional()?)
}

/// Resolve a relation endpoint by name: the batch wins, then the oldest stored entity.
fn resolve_endpoint(
    tx: &Transaction<'_>,
    brain_id: &str,
    batch: &HashMap<&str, i64>,
    name: &str,
) -> CortexResult<Option<i64>> {
    if let Some(id) = batch.get(name) {
        return Ok(Some(*id));
    }
    Ok(tx
        .query_row(
            "SELECT id FROM entities WHERE brain_id = ?1 AND name = ?2 ORDER BY id LIMIT 1",
            params![brain_id, name],
            |row| row.get(0),
        )
        .optional()?)
}

/// Upsert a batch of entities and relations in one transaction.
pub fn write_batch(
    conn: &mut Connection,
    brain_id: &str,
    entities: &[Entity],
    relations: &[Relation],
) -> CortexResult<BatchWrites> {
    let tx = conn.transaction()?;
    let mut writes = BatchWrites::default();
    let mut batch: HashMap<&str, i64> = HashMap::new();

    for entity in entities {
        let existing = entity_id_by_key(&tx, brain_id, &entity.name, &entity.label)?;
        let db_id = match existing {
            Some(id) => id,
            None => {
                tx.execute(
                    "INSERT INTO entities (brain_id, name, label) VALUES (?1, ?2, ?3)",
                    params![brain_id, entity.name, entity.label],
                )?;
                writes.entities_created += 1;
                tx.last_insert_rowid()
            }
        };

        let mut node = EntityNode::new(db_id, brain_id, &entity.name, &entity.label);
        for description in &entity.descriptions {
            let inserted = tx.execute(
                "INSERT INTO descriptions (entity_id, text, source_id) VALUES (?1, ?2, ?3)
                 ON CONFLICT(entity_id, text, source_id) DO NOTHING",
                params![db_id, description.text, description.source_id],
            )?;
            if inserted == 1 {
                node.descriptions.push(description.clone());
            }
        }

        if existing.is_some() && !node.descriptions.is_empty() {
            writes.entities_updated += 1;
        }
        writes.descriptions_added += node.descriptions.len();
        batch.entry(entity.name.as_str()).or_insert(db_id);
        writes.entities.push(node);
    }

    for relation in relations {
        let source = resolve_endpoint(&tx, brain_id, &batch, &relation.source)?;
        let target = resolve_endpoint(&tx, brain_id, &batch, &relation.target)?;
        let (source, target) = match (source, target) {
            (Some(s), Some(t)) => (s, t),
            (None, _) => {
                writes.rejected.push(RejectedRelation::new(
                    relation.clone(),
                    format!("source entity '{}' not found in brain", relation.source),
                ));
                continue;
            }
            (_, None) => {
                writes.rejected.push(RejectedRelation::new(
                    relation.clone(),
                    format!("target entity '{}' not found in brain", relation.target),
                ));
                continue;
            }
        };

        let inserted = tx.execute(
            "INSERT INTO relations (brain_id, source_entity, target_entity, relation) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(source_entity, target_entity, relation) DO NOTHING",
            params![brain_id, source, target, relation.relation],
        )?;
        if inserted == 1 {
            writes.relations.push((
                source,
                target,
                RelationEdge {
                    db_id: tx.last_insert_rowid(),
                    relation: relation.relation.clone(),
                },
            ));
        }
    }

    tx.commit()?;
    Ok(writes)
}

/// Changes made by [`delete_source`].
#[derive(Debug, Default)]
pub struct SourceDeletion {
    pub descriptions_removed: usize,
    /// Pruned entities as `(db id, key)`.
    pub entities_removed: Vec<(i64, EntityKey)>,
    pub relations_removed: usize,
}

const ORPHANS: &str = "SELECT id FROM entities e WHERE e.brain_id = ?1
    AND NOT EXISTS (SELECT 1 FROM descriptions d WHERE d.entity_id = e.id)";

/// Remove a source's descriptions from a brain and prune entities left empty.
pub fn delete_source(
    conn: &mut Connection,
    brain_id: &str,
    source_id: &str,
) -> CortexResult<SourceDeletion> {
    let tx = conn.transaction()?;
    let mut deletion = SourceDeletion {
        descriptions_removed: tx.execute(
            "DELETE FROM descriptions WHERE source_id = ?2
             AND entity_id IN (SELECT id FROM entities WHERE brain_id = ?1)",
            params![brain_id, source_id],
        )?,
        ..Default::default()
    };

    {
        let mut stmt = tx.prepare(&format!(
            "SELECT id, name, label FROM entities WHERE id IN ({}) ORDER BY id",
            ORPHANS
        ))?;
        let rows = stmt.query_map(params![brain_id], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                EntityKey::new(row.get::<_, String>(1)?, row.get::<_, String>(2)?),
            ))
        })?;
        for row in rows {
            deletion.entities_removed.push(row?);
        }
    }

    if !deletion.entities_removed.is_empty() {
        deletion.relations_removed = tx.query_row(
            &format!(
                "SELECT COUNT(*) FROM relations WHERE source_entity IN ({0}) OR target_entity IN ({0})",
                ORPHANS
            ),
            params![brain_id],
            |row| row.get::<_, i64>(0),
        )? as usize;
        tx.execute(
            &format!("DELETE FROM entities WHERE id IN ({})", ORPHANS),
            params![brain_id],
        )?;
    }

    tx.commit()?;
    Ok(deletion)
}

/// Delete every row of a brain. Returns the number of entities removed.
pub fn delete_brain(conn: &Connection, brain_id: &str) -> CortexResult<usize> {
    Ok(conn.execute("DELETE FROM entities WHERE brain_id = ?1", params![brain_id])?)
}
