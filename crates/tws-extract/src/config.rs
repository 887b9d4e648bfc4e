use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::export::CsvWriterConfig;

/// Where the JSON record of a page goes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RecordLayout {
    /// `pages/<name>.json`, tables under `tables/`
    Flat,
    /// `<name>/record.json`, tables under `<name>/tables/`
    Nested,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractConfig {
    #[serde(default = "default_outdir")]
    pub outdir: PathBuf,

    #[serde(default)]
    pub csv: CsvWriterConfig,

    #[serde(default = "default_layout")]
    pub layout: RecordLayout,

    /// One CSV file per table item
    #[serde(default = "default_true")]
    pub write_tables: bool,

    /// `accommodations.csv`, `experiences.csv` and `businesses.csv`
    #[serde(default = "default_true")]
    pub write_segments: bool,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            outdir: default_outdir(),
            csv: CsvWriterConfig::default(),
            layout: default_layout(),
            write_tables: true,
            write_segments: true,
        }
    }
}

impl ExtractConfig {
    pub fn with_outdir(outdir: impl Into<PathBuf>) -> Self {
        Self {
            outdir: outdir.into(),
            ..Default::default()
        }
    }
}

fn default_outdir() -> PathBuf {
    PathBuf::from("out")
}

fn default_layout() -> RecordLayout {
    RecordLayout::Flat
}

fn default_true() -> bool {
    true
}
