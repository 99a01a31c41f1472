//! Knowledge-graph value types.
//!
//! Entities are identified within a brain by `(name, label)`. Each carries an
//! ordered set of provenance-tagged descriptions; an entity whose last
//! description is removed ceases to exist.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CortexError, CortexResult};

/// A single description of an entity, tagged with the document it came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Description {
    pub text: String,
    pub source_id: String,
}

impl Description {
    pub fn new(text: impl Into<String>, source_id: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source_id: source_id.into(),
        }
    }
}

/// Identity of an entity within a brain.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityKey {
    pub name: String,
    pub label: String,
}

impl EntityKey {
    pub fn new(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
        }
    }
}

impl fmt::Display for EntityKey {
    /// Renders as `label-name`, the form used in schema text and graph exports.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.label, self.name)
    }
}

/// A typed node of the knowledge graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub name: String,
    pub label: String,
    pub descriptions: Vec<Description>,
}

impl Entity {
    /// Create an entity, rejecting blank identity fields and empty descriptions.
    pub fn new(
        name: impl Into<String>,
        label: impl Into<String>,
        descriptions: Vec<Description>,
    ) -> CortexResult<Self> {
        let name = name.into().trim().to_string();
        let label = label.into().trim().to_string();

        if name.is_empty() {
            return Err(CortexError::missing_field("name"));
        }
        if label.is_empty() {
            return Err(CortexError::missing_field("label"));
        }
        if descriptions.is_empty() {
            return Err(CortexError::validation(format!(
                "entity '{}-{}' must have at least one description",
                label, name
            )));
        }
        if descriptions.iter().any(|d| d.source_id.trim().is_empty()) {
            return Err(CortexError::missing_field("source_id"));
        }

        let mut entity = Self {
            name,
            label,
            descriptions: Vec::with_capacity(descriptions.len()),
        };
        for description in descriptions {
            entity.add_description(description);
        }
        Ok(entity)
    }

    /// Identity key of this entity.
    pub fn key(&self) -> EntityKey {
        EntityKey::new(self.name.clone(), self.label.clone())
    }

    /// Append a description unless the exact `(text, source_id)` pair is present.
    ///
    /// Returns `true` when the description was added.
    pub fn add_description(&mut self, description: Description) -> bool {
        if self.descriptions.contains(&description) {
            return false;
        }
        self.descriptions.push(description);
        true
    }

    /// Description texts, in insertion order, with empty texts skipped.
    pub fn description_texts(&self) -> impl Iterator<Item = &str> {
        self.descriptions
            .iter()
            .map(|d| d.text.as_str())
            .filter(|t| !t.trim().is_empty())
    }
}

/// A directed, labeled edge between two entities referenced by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Relation {
    pub source: String,
    pub target: String,
    pub relation: String,
}

impl Relation {
    pub fn new(
        source: impl Into<String>,
        target: impl Into<String>,
        relation: impl Into<String>,
    ) -> CortexResult<Self> {
        let source = source.into().trim().to_string();
        let target = target.into().trim().to_string();
        let relation = relation.into().trim().to_string();

        if source.is_empty() {
            return Err(CortexError::missing_field("source"));
        }
        if target.is_empty() {
            return Err(CortexError::missing_field("target"));
        }
        if relation.is_empty() {
            return Err(CortexError::missing_field("relation"));
        }
        Ok(Self {
            source,
            target,
            relation,
        })
    }
}

/// A relation that did not reach the store, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedRelation {
    pub relation: Relation,
    pub reason: String,
}

impl RejectedRelation {
    pub fn new(relation: Relation, reason: impl Into<String>) -> Self {
        Self {
            relation,
            reason: reason.into(),
        }
    }
}

/// Entities and relations produced by extraction (one chunk or merged).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionDelta {
    pub entities: Vec<Entity>,
    pub relations: Vec<Relation>,
}

impl ExtractionDelta {
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty() && self.relations.is_empty()
    }
}

/// A relation whose endpoints have been resolved to entity identities.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResolvedRelation {
    pub source: EntityKey,
    pub target: EntityKey,
    pub relation: String,
}

/// Result of a neighborhood query.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Neighborhood {
    /// Entities whose names were asked for and exist in the brain.
    pub seeds: Vec<Entity>,
    /// Entities reached within the hop limit that are not seeds.
    pub neighbors: Vec<Entity>,
    /// Relations among the returned entities.
    pub relations: Vec<ResolvedRelation>,
}

impl Neighborhood {
    pub fn is_empty(&self) -> bool {
        self.seeds.is_empty() && self.neighbors.is_empty()
    }

    /// All returned entities, seeds first.
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.seeds.iter().chain(self.neighbors.iter())
    }
}

/// What an upsert changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpsertOutcome {
    pub entities_created: usize,
    pub entities_updated: usize,
    pub descriptions_added: usize,
    pub relations_created: usize,
    /// Relations whose endpoints could not be resolved in the brain.
    pub rejected: Vec<RejectedRelation>,
}

/// What a provenance deletion removed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvenanceDeletion {
    pub descriptions_removed: usize,
    /// Entities pruned because no description remained.
    pub entities_removed: Vec<EntityKey>,
    pub relations_removed: usize,
}

/// Every entity and relation of one brain.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub entities: Vec<Entity>,
    pub relations: Vec<ResolvedRelation>,
}

/// Node of a force-directed graph view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForceGraphNode {
    pub id: String,
    pub name: String,
    pub label: String,
    pub group: String,
}

/// Link of a force-directed graph view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForceGraphLink {
    pub source: String,
    pub target: String,
    pub label: String,
}

/// `{nodes, links}` document consumed by force-graph front ends.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForceGraph {
    pub nodes: Vec<ForceGraphNode>,
    pub links: Vec<ForceGraphLink>,
}

impl From<&GraphSnapshot> for ForceGraph {
    fn from(snapshot: &GraphSnapshot) -> Self {
        let nodes = snapshot
            .entities
            .iter()
            .map(|e| ForceGraphNode {
                id: e.key().to_string(),
                name: e.name.clone(),
                label: e.label.clone(),
                group: e.label.clone(),
            })
            .collect();
        let links = snapshot
            .relations
            .iter()
            .map(|r| ForceGraphLink {
                source: r.source.to_string(),
                target: r.target.to_string(),
                label: r.relation.clone(),
            })
            .collect();
        Self { nodes, links }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_requires_identity_and_descriptions() {
        let desc = vec![Description::new("capital", "doc-1")];
        assert!(Entity::new("  ", "City", desc.clone()).is_err());
        assert!(Entity::new("Paris", "", desc.clone()).is_err());
        assert!(Entity::new("Paris", "City", vec![]).is_err());
        assert!(Entity::new("Paris", "City", vec![Description::new("x", " ")]).is_err());

        let entity = Entity::new(" Paris ", "City", desc).unwrap();
        assert_eq!(entity.name, "Paris");
        assert_eq!(entity.key().to_string(), "City-Paris");
    }

    #[test]
    fn test_add_description_is_idempotent() {
        let mut entity =
            Entity::new("Paris", "City", vec![Description::new("capital", "doc-1")]).unwrap();

        assert!(!entity.add_description(Description::new("capital", "doc-1")));
        assert!(entity.add_description(Description::new("capital", "doc-2")));
        assert_eq!(entity.descriptions.len(), 2);
    }

    #[test]
    fn test_constructor_collapses_duplicate_descriptions() {
        let entity = Entity::new(
            "Paris",
            "City",
            vec![
                Description::new("capital", "doc-1"),
                Description::new("capital", "doc-1"),
            ],
        )
        .unwrap();
        assert_eq!(entity.descriptions.len(), 1);
    }

    #[test]
    fn test_relation_rejects_blank_fields() {
        assert!(Relation::new("Paris", "France", " ").is_err());
        assert!(Relation::new("", "France", "capital of").is_err());
        let rel = Relation::new("Paris", "France", "capital of").unwrap();
        assert_eq!(rel.relation, "capital of");
    }

    #[test]
    fn test_force_graph_from_snapshot() {
        let paris =
            Entity::new("Paris", "City", vec![Description::new("capital", "doc-1")]).unwrap();
        let france =
            Entity::new("France", "Country", vec![Description::new("a country", "doc-1")]).unwrap();
        let snapshot = GraphSnapshot {
            relations: vec![ResolvedRelation {
                source: paris.key(),
                target: france.key(),
                relation: "capital of".to_string(),
            }],
            entities: vec![paris, france],
        };

        let graph = ForceGraph::from(&snapshot);
        assert_eq!(graph.nodes.len(), 2);
        assert_eq!(graph.nodes[0].id, "City-Paris");
        assert_eq!(graph.nodes[0].group, "City");
        assert_eq!(graph.links[0].source, "City-Paris");
        assert_eq!(graph.links[0].target, "Country-France");
        assert_eq!(graph.links[0].label, "capital of");
    }
}
