//! In-memory mirror of the persisted graph using petgraph `StableDiGraph`.
//!
//! Node indices stay valid across removals, so the database-id index never
//! needs rebuilding when entities are pruned.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet, VecDeque};

use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;
use petgraph::Direction;

use cortex_core::types::{
    Description, Entity, EntityKey, GraphSnapshot, Neighborhood, ResolvedRelation,
};

/// Node data in the mirror.
#[derive(Debug, Clone)]
pub struct EntityNode {
    /// Database ID (from SQLite).
    pub db_id: i64,
    pub brain_id: String,
    pub name: String,
    pub label: String,
    /// Descriptions in insertion order.
    pub descriptions: Vec<Description>,
}

impl EntityNode {
    pub fn new(
        db_id: i64,
        brain_id: impl Into<String>,
        name: impl Into<String>,
        label: impl Into<String>,
    ) -> Self {
        Self {
            db_id,
            brain_id: brain_id.into(),
            name: name.into(),
            label: label.into(),
            descriptions: Vec::new(),
        }
    }

    pub fn key(&self) -> EntityKey {
        EntityKey::new(self.name.clone(), self.label.clone())
    }

    pub fn to_entity(&self) -> Entity {
        Entity {
            name: self.name.clone(),
            label: self.label.clone(),
            descriptions: self.descriptions.clone(),
        }
    }
}

/// Edge data in the mirror.
#[derive(Debug, Clone)]
pub struct RelationEdge {
    /// Database ID (from SQLite).
    pub db_id: i64,
    pub relation: String,
}

/// The in-memory graph type.
pub type MemoryGraph = StableDiGraph<EntityNode, RelationEdge>;

/// Mirror of every brain's graph with an index by database id.
#[derive(Debug, Default)]
pub struct GraphMirror {
    graph: MemoryGraph,
    by_db_id: HashMap<i64, NodeIndex>,
}

impl GraphMirror {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node, or append descriptions to the node already mirroring `db_id`.
    pub fn merge_entity(&mut self, node: EntityNode) {
        match self.by_db_id.get(&node.db_id) {
            Some(&idx) => {
                if let Some(existing) = self.graph.node_weight_mut(idx) {
                    for description in node.descriptions {
                        if !existing.descriptions.contains(&description) {
                            existing.descriptions.push(description);
                        }
                    }
                }
            }
            None => {
                let db_id = node.db_id;
                let idx = self.graph.add_node(node);
                self.by_db_id.insert(db_id, idx);
            }
        }
    }

    /// Add an edge between two mirrored entities. Returns `false` if either is unknown.
    pub fn add_relation(&mut self, source: i64, target: i64, edge: RelationEdge) -> bool {
        match (self.by_db_id.get(&source), self.by_db_id.get(&target)) {
            (Some(&s), Some(&t)) => {
                self.graph.add_edge(s, t, edge);
                true
            }
            _ => false,
        }
    }

    /// Drop every description of `brain_id` that came from `source_id`.
    pub fn remove_source(&mut self, brain_id: &str, source_id: &str) {
        let nodes: Vec<NodeIndex> = self.tenant_nodes(brain_id).collect();
        for idx in nodes {
            if let Some(node) = self.graph.node_weight_mut(idx) {
                node.descriptions.retain(|d| d.source_id != source_id);
            }
        }
    }

    /// Remove an entity and its incident edges.
    pub fn remove_entity(&mut self, db_id: i64) {
        if let Some(idx) = self.by_db_id.remove(&db_id) {
            self.graph.remove_node(idx);
        }
    }

    /// Remove every entity of a brain. Returns how many were removed.
    pub fn remove_tenant(&mut self, brain_id: &str) -> usize {
        let nodes: Vec<NodeIndex> = self.tenant_nodes(brain_id).collect();
        for idx in &nodes {
            if let Some(node) = self.graph.remove_node(*idx) {
                self.by_db_id.remove(&node.db_id);
            }
        }
        nodes.len()
    }

    fn tenant_nodes<'a>(&'a self, brain_id: &'a str) -> impl Iterator<Item = NodeIndex> + 'a {
        self.graph
            .node_indices()
            .filter(move |idx| self.graph[*idx].brain_id == brain_id)
    }

    fn resolve(&self, source: NodeIndex, target: NodeIndex, edge: &RelationEdge) -> ResolvedRelation {
        ResolvedRelation {
            source: self.graph[source].key(),
            target: self.graph[target].key(),
            relation: edge.relation.clone(),
        }
    }

    fn sorted_entities(&self, nodes: impl Iterator<Item = NodeIndex>) -> Vec<Entity> {
        let mut entities: Vec<Entity> = nodes.map(|idx| self.graph[idx].to_entity()).collect();
        entities.sort_by(|a, b| a.key().cmp(&b.key()));
        entities
    }

    /// Named entities of a brain, everything within `hops` undirected edges of
    /// them, and the relations the traversal walked.
    ///
    /// A relation is kept when one endpoint lies strictly inside the radius and
    /// the other was reached, so edges between two frontier nodes are left out.
    pub fn neighborhood(&self, brain_id: &str, names: &[String], hops: usize) -> Neighborhood {
        let wanted: HashSet<&str> = names.iter().map(String::as_str).collect();
        let seeds: Vec<NodeIndex> = self
            .tenant_nodes(brain_id)
            .filter(|idx| wanted.contains(self.graph[*idx].name.as_str()))
            .collect();

        let mut depth: HashMap<NodeIndex, usize> = seeds.iter().map(|idx| (*idx, 0)).collect();
        let mut queue: VecDeque<NodeIndex> = seeds.iter().copied().collect();
        while let Some(idx) = queue.pop_front() {
            let d = depth[&idx];
            if d >= hops {
                continue;
            }
            for next in self.graph.neighbors_undirected(idx) {
                if let Entry::Vacant(slot) = depth.entry(next) {
                    slot.insert(d + 1);
                    queue.push_back(next);
                }
            }
        }

        let mut relations: Vec<ResolvedRelation> = depth
            .keys()
            .flat_map(|idx| self.graph.edges_directed(*idx, Direction::Outgoing))
            .filter(|edge| match (depth.get(&edge.source()), depth.get(&edge.target())) {
                (Some(s), Some(t)) => (*s).min(*t) < hops,
                _ => false,
            })
            .map(|edge| self.resolve(edge.source(), edge.target(), edge.weight()))
            .collect();
        relations.sort();

        let seed_set: HashSet<NodeIndex> = seeds.iter().copied().collect();
        Neighborhood {
            seeds: self.sorted_entities(seeds.into_iter()),
            neighbors: self.sorted_entities(depth.keys().copied().filter(|idx| !seed_set.contains(idx))),
            relations,
        }
    }

    /// Every entity and relation of a brain.
    pub fn snapshot(&self, brain_id: &str) -> GraphSnapshot {
        let nodes: Vec<NodeIndex> = self.tenant_nodes(brain_id).collect();
        let mut relations: Vec<ResolvedRelation> = nodes
            .iter()
            .flat_map(|idx| self.graph.edges_directed(*idx, Direction::Outgoing))
            .map(|edge| self.resolve(edge.source(), edge.target(), edge.weight()))
            .collect();
        relations.sort();

        GraphSnapshot {
            entities: self.sorted_entities(nodes.into_iter()),
            relations,
        }
    }

    pub fn entity_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn relation_count(&self) -> usize {
        self.graph.edge_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(db_id: i64, brain: &str, name: &str) -> EntityNode {
        let mut node = EntityNode::new(db_id, brain, name, "Thing");
        node.descriptions.push(Description::new(format!("about {}", name), "doc-1"));
        node
    }

    fn edge(db_id: i64, relation: &str) -> RelationEdge {
        RelationEdge {
            db_id,
            relation: relation.to_string(),
        }
    }

    /// a -> b -> c -> d in brain b1, plus an unrelated x in b2.
    fn chain() -> GraphMirror {
        let mut mirror = GraphMirror::new();
        for (id, name) in [(1, "a"), (2, "b"), (3, "c"), (4, "d")] {
            mirror.merge_entity(node(id, "b1", name));
        }
        mirror.merge_entity(node(5, "b2", "x"));
        assert!(mirror.add_relation(1, 2, edge(1, "next")));
        assert!(mirror.add_relation(2, 3, edge(2, "next")));
        assert!(mirror.add_relation(3, 4, edge(3, "next")));
        mirror
    }

    fn names(entities: &[Entity]) -> Vec<&str> {
        entities.iter().map(|e| e.name.as_str()).collect()
    }

    #[test]
    fn test_neighborhood_respects_hops() {
        let mirror = chain();
        let query = vec!["b".to_string()];

        let zero = mirror.neighborhood("b1", &query, 0);
        assert_eq!(names(&zero.seeds), vec!["b"]);
        assert!(zero.neighbors.is_empty());
        assert!(zero.relations.is_empty());

        let one = mirror.neighborhood("b1", &query, 1);
        assert_eq!(names(&one.neighbors), vec!["a", "c"]);
        assert_eq!(one.relations.len(), 2);

        let two = mirror.neighborhood("b1", &query, 2);
        assert_eq!(names(&two.neighbors), vec!["a", "c", "d"]);
        assert_eq!(two.relations.len(), 3);
    }

    #[test]
    fn test_neighborhood_skips_edges_between_frontier_nodes() {
        // a -> b -> c plus a side edge a -> c; seeded at b, a and c are both frontier.
        let mut mirror = GraphMirror::new();
        for (id, name) in [(1, "a"), (2, "b"), (3, "c")] {
            mirror.merge_entity(node(id, "b1", name));
        }
        mirror.add_relation(1, 2, edge(1, "next"));
        mirror.add_relation(2, 3, edge(2, "next"));
        mirror.add_relation(1, 3, edge(3, "side"));

        let one = mirror.neighborhood("b1", &["b".to_string()], 1);
        assert_eq!(names(&one.neighbors), vec!["a", "c"]);
        let kinds: Vec<&str> = one.relations.iter().map(|r| r.relation.as_str()).collect();
        assert_eq!(kinds, vec!["next", "next"]);

        let two = mirror.neighborhood("b1", &["b".to_string()], 2);
        assert_eq!(two.relations.len(), 3);
    }

    #[test]
    fn test_neighborhood_is_tenant_scoped() {
        let mirror = chain();
        assert!(mirror
            .neighborhood("b2", &["a".to_string()], 3)
            .is_empty());
        assert_eq!(mirror.snapshot("b2").entities.len(), 1);
    }

    #[test]
    fn test_merge_entity_appends_new_descriptions() {
        let mut mirror = chain();
        let mut update = EntityNode::new(1, "b1", "a", "Thing");
        update.descriptions.push(Description::new("about a", "doc-1"));
        update.descriptions.push(Description::new("more about a", "doc-2"));
        mirror.merge_entity(update);

        let snapshot = mirror.snapshot("b1");
        assert_eq!(snapshot.entities[0].descriptions.len(), 2);
        assert_eq!(mirror.entity_count(), 5);
    }

    #[test]
    fn test_remove_entity_drops_incident_edges() {
        let mut mirror = chain();
        mirror.remove_entity(2);
        assert_eq!(mirror.relation_count(), 1);
        assert!(!mirror.add_relation(2, 3, edge(9, "next")));
    }

    #[test]
    fn test_remove_tenant() {
        let mut mirror = chain();
        assert_eq!(mirror.remove_tenant("b1"), 4);
        assert_eq!(mirror.entity_count(), 1);
        assert_eq!(mirror.relation_count(), 0);
    }
}
