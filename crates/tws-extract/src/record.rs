use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::item::{DataItem, Entity, Table};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordMeta {
    pub method_chain: Vec<String>,
    pub count: usize,
    pub source_url: String,
}

/// Extraction output of one page with its provenance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRecord {
    pub url: String,
    pub extracted_at: DateTime<Utc>,
    pub data_items: Vec<DataItem>,
    pub meta: RecordMeta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PageRecord {
    pub fn new(url: impl Into<String>, data_items: Vec<DataItem>, method_chain: Vec<String>) -> Self {
        let url = url.into();
        Self {
            meta: RecordMeta {
                method_chain,
                count: data_items.len(),
                source_url: url.clone(),
            },
            url,
            extracted_at: Utc::now(),
            data_items,
            error: None,
        }
    }

    /// Record of a page that could not be retrieved
    pub fn failed(url: impl Into<String>, error: impl ToString) -> Self {
        let mut record = Self::new(url, Vec::new(), Vec::new());
        record.error = Some(error.to_string());
        record
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }

    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.data_items.iter().filter_map(DataItem::as_entity)
    }

    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        self.data_items.iter().filter_map(DataItem::as_table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialized_shape() {
        let record = PageRecord::new("https://example.test/", Vec::new(), vec!["fetch".into(), "html-tables".into()]);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["url"], "https://example.test/");
        assert_eq!(json["meta"]["methodChain"][1], "html-tables");
        assert_eq!(json["meta"]["count"], 0);
        assert!(json["extractedAt"].as_str().unwrap().starts_with("20"));
        assert!(json.get("error").is_none());

        let failed = PageRecord::failed("https://example.test/x", "timeout");
        assert!(failed.is_failed());
        assert_eq!(serde_json::to_value(&failed).unwrap()["error"], "timeout");
    }
}
