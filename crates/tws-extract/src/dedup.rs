use std::collections::HashSet;

use crate::item::Entity;

fn trimmed(field: &Option<String>) -> String {
    field.as_deref().unwrap_or_default().trim().to_string()
}

/// Identity of an entity across pages and extractors
pub fn identity_key(entity: &Entity) -> (String, String, String, String, String) {
    let kind = match entity.segment {
        Some(segment) => segment.as_str().to_string(),
        None => entity.entity_type.clone(),
    };
    (
        trimmed(&entity.name).to_lowercase(),
        kind,
        trimmed(&entity.telephone),
        trimmed(&entity.email),
        trimmed(&entity.url),
    )
}

/// Drops entities whose identity was already seen, the first occurrence wins
pub fn dedupe<I>(entities: I) -> Vec<Entity>
where
    I: IntoIterator<Item = Entity>,
{
    let mut seen = HashSet::new();
    entities
        .into_iter()
        .filter(|e| seen.insert(identity_key(e)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::Segment;

    fn entity(name: &str, phone: &str, confidence: f32) -> Entity {
        Entity {
            name: Some(name.into()),
            segment: Some(Segment::Accommodation),
            entity_type: "hotel".into(),
            telephone: Some(phone.into()),
            url: Some("https://hotel.test".into()),
            confidence,
            ..Default::default()
        }
    }

    #[test]
    fn first_seen_wins() {
        let out = dedupe(vec![
            entity("Hotel Sol", "964 000 000", 0.7),
            entity(" hotel sol ", "964 000 000 ", 0.95),
            entity("Hotel Sol", "964 111 111", 0.95),
        ]);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].confidence, 0.7);
        assert_eq!(out[1].telephone.as_deref(), Some("964 111 111"));
    }

    #[test]
    fn idempotent() {
        let input = vec![
            entity("A", "1", 0.9),
            entity("B", "1", 0.9),
            entity("a", "1", 0.8),
            entity("C", "2", 0.9),
        ];
        let once = dedupe(input);
        let twice = dedupe(once.clone());
        assert_eq!(once, twice);
        assert_eq!(once.len(), 3);
    }

    #[test]
    fn legacy_type_when_unclassified() {
        let mut a = entity("Casa", "1", 0.9);
        a.segment = None;
        let mut b = a.clone();
        b.entity_type = "organization".into();
        assert_eq!(dedupe(vec![a, b]).len(), 2);
    }
}
