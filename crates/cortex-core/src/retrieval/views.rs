//! Textual views of an entity description and their deterministic point ids.
//!
//! Each description is embedded several times, phrased differently, so that
//! questions worded around the name, the type or the content all land near it.

use uuid::Uuid;

use crate::types::Entity;

/// Number of views generated per description.
pub const VIEW_COUNT: usize = 3;

/// Render the non-empty views of one description, as `(view_index, text)`.
pub fn description_views(entity: &Entity, description: &str) -> Vec<(usize, String)> {
    let description = description.trim();
    let candidates = if description.is_empty() {
        [
            format!("{} is a {}.", entity.name, entity.label),
            format!("{} ({})", entity.name, entity.label),
            String::new(),
        ]
    } else {
        [
            format!("{} is a {}. {}", entity.name, entity.label, description),
            format!("{} ({}): {}", entity.name, entity.label, description),
            description.to_string(),
        ]
    };

    candidates
        .into_iter()
        .enumerate()
        .filter(|(_, text)| !text.is_empty())
        .collect()
}

/// Deterministic id of one indexed view.
///
/// The same content always maps to the same id, so re-indexing overwrites
/// instead of duplicating. The entity identity is part of the key so two
/// entities sharing a description text never collide.
pub fn point_id(entity: &Entity, source_id: &str, description: &str, view_index: usize) -> Uuid {
    let key = format!(
        "{}\u{1f}{}\u{1f}{}\u{1f}{}\u{1f}{}",
        source_id, entity.label, entity.name, description, view_index
    );
    Uuid::new_v5(&Uuid::NAMESPACE_OID, key.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Description;

    fn paris() -> Entity {
        Entity::new("Paris", "City", vec![Description::new("Capital of France", "doc-1")]).unwrap()
    }

    #[test]
    fn test_three_views_for_described_entity() {
        let views = description_views(&paris(), "Capital of France");
        assert_eq!(
            views,
            vec![
                (0, "Paris is a City. Capital of France".to_string()),
                (1, "Paris (City): Capital of France".to_string()),
                (2, "Capital of France".to_string()),
            ]
        );
    }

    #[test]
    fn test_empty_description_skips_bare_view() {
        let views = description_views(&paris(), "  ");
        assert_eq!(
            views,
            vec![
                (0, "Paris is a City.".to_string()),
                (1, "Paris (City)".to_string()),
            ]
        );
    }

    #[test]
    fn test_point_id_is_deterministic() {
        let a = point_id(&paris(), "doc-1", "Capital of France", 0);
        let b = point_id(&paris(), "doc-1", "Capital of France", 0);
        assert_eq!(a, b);

        assert_ne!(a, point_id(&paris(), "doc-1", "Capital of France", 1));
        assert_ne!(a, point_id(&paris(), "doc-2", "Capital of France", 0));
        assert_ne!(a, point_id(&paris(), "doc-1", "Home of the Louvre", 0));
    }

    #[test]
    fn test_point_id_separates_entities_with_same_text() {
        let lyon = Entity::new("Lyon", "City", vec![Description::new("", "doc-1")]).unwrap();
        assert_ne!(point_id(&paris(), "doc-1", "", 0), point_id(&lyon, "doc-1", "", 0));
    }
}
