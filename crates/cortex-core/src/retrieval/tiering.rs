//! Two-tier selection of vector search hits.
//!
//! Hits below the low threshold are noise. Hits at or above the high threshold
//! are all kept. Everything in between competes for `limit` slots, with at most
//! one hit per source document so a single long document cannot crowd out the
//! rest.

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;

use super::config::RetrievalConfig;

/// An entity view matched by vector search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityHit {
    pub point_id: String,
    pub entity_name: String,
    pub entity_label: String,
    pub source_id: String,
    pub description: String,
    pub view_index: usize,
    pub score: f32,
}

fn by_score_desc(a: &EntityHit, b: &EntityHit) -> Ordering {
    OrderedFloat(b.score)
        .cmp(&OrderedFloat(a.score))
        .then_with(|| a.entity_name.cmp(&b.entity_name))
        .then_with(|| a.point_id.cmp(&b.point_id))
}

/// Apply the two-tier policy. The result is sorted by score, best first.
pub fn select_tiered(hits: Vec<EntityHit>, config: &RetrievalConfig) -> Vec<EntityHit> {
    let mut confident = Vec::new();
    let mut best_per_source: HashMap<String, EntityHit> = HashMap::new();

    for hit in hits.into_iter().filter(|h| h.score >= config.low_threshold) {
        if hit.score >= config.high_threshold {
            confident.push(hit);
            continue;
        }
        match best_per_source.get(&hit.source_id) {
            Some(current) if by_score_desc(current, &hit) != Ordering::Greater => {}
            _ => {
                best_per_source.insert(hit.source_id.clone(), hit);
            }
        }
    }

    let mut moderate: Vec<EntityHit> = best_per_source.into_values().collect();
    moderate.sort_by(by_score_desc);
    moderate.truncate(config.limit);

    let mut selected = confident;
    selected.extend(moderate);
    selected.sort_by(by_score_desc);
    selected
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(name: &str, source: &str, score: f32) -> EntityHit {
        EntityHit {
            point_id: format!("{}-{}-{}", name, source, score),
            entity_name: name.to_string(),
            entity_label: "Thing".to_string(),
            source_id: source.to_string(),
            description: String::new(),
            view_index: 0,
            score,
        }
    }

    fn config(limit: usize) -> RetrievalConfig {
        RetrievalConfig {
            limit,
            low_threshold: 0.5,
            high_threshold: 0.8,
            ..Default::default()
        }
    }

    #[test]
    fn test_low_scores_are_dropped() {
        let selected = select_tiered(vec![hit("a", "s1", 0.49), hit("b", "s2", 0.2)], &config(5));
        assert!(selected.is_empty());
    }

    #[test]
    fn test_confident_hits_are_uncapped() {
        let hits = (0..6).map(|i| hit(&format!("e{i}"), "s1", 0.9)).collect();
        let selected = select_tiered(hits, &config(2));
        assert_eq!(selected.len(), 6);
    }

    #[test]
    fn test_moderate_hits_keep_best_per_source() {
        let hits = vec![
            hit("a", "s1", 0.6),
            hit("b", "s1", 0.7),
            hit("c", "s2", 0.55),
            hit("d", "s2", 0.65),
        ];
        let selected = select_tiered(hits, &config(10));
        let names: Vec<&str> = selected.iter().map(|h| h.entity_name.as_str()).collect();
        assert_eq!(names, vec!["b", "d"]);
    }

    #[test]
    fn test_moderate_hits_are_truncated_to_limit() {
        let hits = vec![
            hit("a", "s1", 0.6),
            hit("b", "s2", 0.7),
            hit("c", "s3", 0.75),
            hit("top", "s1", 0.95),
        ];
        let selected = select_tiered(hits, &config(2));
        let names: Vec<&str> = selected.iter().map(|h| h.entity_name.as_str()).collect();
        assert_eq!(names, vec!["top", "c", "b"]);
    }

    #[test]
    fn test_thresholds_are_inclusive() {
        let selected = select_tiered(
            vec![hit("edge-high", "s1", 0.8), hit("edge-low", "s1", 0.5)],
            &config(1),
        );
        assert_eq!(selected.len(), 2);
        assert_eq!(selected[0].entity_name, "edge-high");
    }

    #[test]
    fn test_tiering_properties_hold() {
        let hits: Vec<EntityHit> = (0..40)
            .map(|i| hit(&format!("e{i}"), &format!("s{}", i % 7), (i as f32) / 40.0))
            .collect();
        let cfg = config(3);
        let selected = select_tiered(hits.clone(), &cfg);

        let confident_in = hits.iter().filter(|h| h.score >= 0.8).count();
        let confident_out = selected.iter().filter(|h| h.score >= 0.8).count();
        assert_eq!(confident_in, confident_out);

        let moderate: Vec<&EntityHit> = selected.iter().filter(|h| h.score < 0.8).collect();
        assert!(moderate.len() <= 3);
        let mut sources: Vec<&str> = moderate.iter().map(|h| h.source_id.as_str()).collect();
        sources.sort();
        sources.dedup();
        assert_eq!(sources.len(), moderate.len());
        assert!(selected.iter().all(|h| h.score >= 0.5));
        assert!(selected.windows(2).all(|w| w[0].score >= w[1].score));
    }
}
