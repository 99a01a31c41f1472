//! Compact text rendering of a graph neighborhood for answer prompts.
//!
//! Relations render as
//! `label-name(desc, desc) -> relation -> label-name(desc)` and entities that
//! take part in no rendered relation get a standalone `label-name(desc)` line.
//! Identical lines are emitted once, in first-seen order.

use std::collections::{HashMap, HashSet};

use crate::types::{Entity, EntityKey, Neighborhood, ResolvedRelation};

/// Returned when there is nothing to render.
pub const NO_SCHEMA_FOUND: &str = "No schema information found.";

fn render_entity(key: &EntityKey, entity: Option<&Entity>) -> String {
    let mut seen = HashSet::new();
    let descriptions: Vec<&str> = entity
        .map(|e| e.description_texts().filter(|t| seen.insert(*t)).collect())
        .unwrap_or_default();
    format!("{}({})", key, descriptions.join(", "))
}

/// Render seeds, neighbors and relations as schema text.
pub fn synthesize_schema(
    seeds: &[Entity],
    neighbors: &[Entity],
    relations: &[ResolvedRelation],
) -> String {
    let mut by_key: HashMap<EntityKey, &Entity> = HashMap::new();
    for entity in seeds.iter().chain(neighbors) {
        by_key.entry(entity.key()).or_insert(entity);
    }

    let mut lines: Vec<String> = Vec::new();
    let mut seen_lines: HashSet<String> = HashSet::new();
    let mut connected: HashSet<&EntityKey> = HashSet::new();

    for relation in relations {
        let line = format!(
            "{} -> {} -> {}",
            render_entity(&relation.source, by_key.get(&relation.source).copied()),
            relation.relation,
            render_entity(&relation.target, by_key.get(&relation.target).copied()),
        );
        connected.insert(&relation.source);
        connected.insert(&relation.target);
        if seen_lines.insert(line.clone()) {
            lines.push(line);
        }
    }

    for entity in seeds.iter().chain(neighbors) {
        let key = entity.key();
        if connected.contains(&key) {
            continue;
        }
        let line = render_entity(&key, Some(entity));
        if seen_lines.insert(line.clone()) {
            lines.push(line);
        }
    }

    if lines.is_empty() {
        return NO_SCHEMA_FOUND.to_string();
    }

    tracing::debug!(
        "Synthesized schema: {} relations, {} entities, {} lines",
        relations.len(),
        by_key.len(),
        lines.len()
    );
    lines.join("\n")
}

/// Render a neighborhood as schema text.
pub fn synthesize_neighborhood(neighborhood: &Neighborhood) -> String {
    synthesize_schema(
        &neighborhood.seeds,
        &neighborhood.neighbors,
        &neighborhood.relations,
    )
}
