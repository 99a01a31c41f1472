//! Cross-chunk merge of extraction deltas.
//!
//! Entities with identical `(name, label)` collapse into one entity whose
//! descriptions are the inputs' concatenated in first-seen order, with exact
//! duplicates dropped. Relations collapse on the full `(source, target,
//! relation)` tuple. Entities and relations come out sorted by identity key,
//! so the sets do not depend on the order chunks finished in.

use std::collections::{BTreeMap, BTreeSet};

use crate::types::{Description, Entity, EntityKey, ExtractionDelta, Relation};

/// Merge per-chunk deltas into one.
pub fn merge_deltas<I>(deltas: I) -> ExtractionDelta
where
    I: IntoIterator<Item = ExtractionDelta>,
{
    let mut entities: BTreeMap<EntityKey, Vec<Description>> = BTreeMap::new();
    let mut relations: BTreeSet<Relation> = BTreeSet::new();

    for delta in deltas {
        for entity in delta.entities {
            let merged = entities.entry(entity.key()).or_default();
            for description in entity.descriptions {
                if !merged.contains(&description) {
                    merged.push(description);
                }
            }
        }
        relations.extend(delta.relations);
    }

    let entities = entities
        .into_iter()
        .map(|(key, descriptions)| Entity {
            name: key.name,
            label: key.label,
            descriptions,
        })
        .collect();

    ExtractionDelta {
        entities,
        relations: relations.into_iter().collect(),
    }
}
