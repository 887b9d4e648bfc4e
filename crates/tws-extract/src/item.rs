use std::fmt;

use serde::{Deserialize, Serialize};

/// Unit of extraction output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DataItem {
    Table(Table),
    Entity(Box<Entity>),
}

impl DataItem {
    pub fn as_entity(&self) -> Option<&Entity> {
        match self {
            Self::Entity(e) => Some(e),
            Self::Table(_) => None,
        }
    }

    pub fn as_table(&self) -> Option<&Table> {
        match self {
            Self::Table(t) => Some(t),
            Self::Entity(_) => None,
        }
    }
}

impl From<Entity> for DataItem {
    fn from(entity: Entity) -> Self {
        Self::Entity(Box::new(entity))
    }
}

impl From<Table> for DataItem {
    fn from(table: Table) -> Self {
        Self::Table(table)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Null,
    Number(f64),
    Text(String),
}

impl Cell {
    pub fn text(s: &str) -> Self {
        let s = s.trim();
        if s.is_empty() {
            Self::Null
        } else {
            Self::Text(s.to_string())
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => write!(f, "{}", *n as i64),
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Table {
    pub label: String,
    pub schema: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
    pub source_method: String,
    pub source_url: String,
    pub confidence: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Segment {
    Accommodation,
    Experience,
    Business,
}

impl Segment {
    pub const ALL: [Segment; 3] = [Self::Accommodation, Self::Experience, Self::Business];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accommodation => "accommodation",
            Self::Experience => "experience",
            Self::Business => "business",
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which signal decided the segment of an entity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentSource {
    Schema,
    Keywords,
    Url,
    Fallback,
    #[default]
    None,
}

impl SegmentSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Schema => "schema",
            Self::Keywords => "keywords",
            Self::Url => "url",
            Self::Fallback => "fallback",
            Self::None => "none",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    pub segment: Option<Segment>,
    pub subtype: Option<String>,
    pub segment_source: SegmentSource,
    pub segment_score: u8,
    /// Coarse type kept for older consumers (`hotel`, `restaurant`, `other`...)
    pub entity_type: String,
    pub name: Option<String>,
    pub legal_name: Option<String>,
    pub description: Option<String>,
    pub tourism_license: Option<String>,
    pub tax_id: Option<String>,
    pub url: Option<String>,
    pub same_as: Vec<String>,
    pub telephone: Option<String>,
    pub email: Option<String>,
    pub price_range: Option<String>,
    pub rating: Option<f64>,
    pub rating_count: Option<u64>,
    pub address_street: Option<String>,
    pub address_locality: Option<String>,
    pub address_region: Option<String>,
    pub address_postal_code: Option<String>,
    pub address_country: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub checkin: Option<String>,
    pub checkout: Option<String>,
    pub event_start: Option<String>,
    pub event_end: Option<String>,
    pub schema_type: Option<String>,
    pub source_method: String,
    pub source_url: String,
    pub confidence: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn items_are_tagged_by_type() {
        let table = DataItem::from(Table {
            label: "t1".into(),
            schema: vec!["A".into()],
            rows: vec![vec![Cell::Number(1.5), Cell::Null]],
            source_method: "html".into(),
            source_url: "https://example.test/".into(),
            confidence: 0.98,
            period: None,
        });
        let json = serde_json::to_value(&table).unwrap();
        assert_eq!(json["type"], "table");
        assert_eq!(json["sourceMethod"], "html");
        assert_eq!(json["rows"][0], serde_json::json!([1.5, null]));
        assert!(json.get("period").is_none());

        let entity = DataItem::from(Entity {
            segment: Some(Segment::Accommodation),
            entity_type: "hotel".into(),
            ..Default::default()
        });
        let json = serde_json::to_value(&entity).unwrap();
        assert_eq!(json["type"], "entity");
        assert_eq!(json["segment"], "accommodation");
        assert_eq!(json["segmentSource"], "none");
    }

    #[test]
    fn cells_render_for_csv() {
        assert_eq!(Cell::Number(1234.0).to_string(), "1234");
        assert_eq!(Cell::Number(3.25).to_string(), "3.25");
        assert_eq!(Cell::Null.to_string(), "");
        assert_eq!(Cell::text("  "), Cell::Null);
    }
}
