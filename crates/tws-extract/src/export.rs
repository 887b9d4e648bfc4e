//! CSV and JSON files written out of page records and entities.

use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, Utc};
use fs_err as fs;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::{ExtractConfig, RecordLayout};
use crate::item::{Entity, Segment, Table};
use crate::record::PageRecord;

/// Slugs are cut to this many characters
const MAX_SLUG: usize = 180;

pub const ENTITY_COLUMNS: &[&str] = &[
    "segment",
    "subtype",
    "segmentSource",
    "segmentScore",
    "entityType",
    "name",
    "legalName",
    "description",
    "tourismLicense",
    "taxId",
    "url",
    "sameAs",
    "telephone",
    "email",
    "priceRange",
    "rating",
    "ratingCount",
    "addressStreet",
    "addressLocality",
    "addressRegion",
    "addressPostalCode",
    "addressCountry",
    "lat",
    "lon",
    "checkin",
    "checkout",
    "eventStart",
    "eventEnd",
    "schemaType",
    "sourceMethod",
    "sourceUrl",
    "confidence",
];

lazy_static! {
    static ref NON_SLUG: Regex = Regex::new(r"[^\w\-\.]+").unwrap();
    static ref UNDERSCORES: Regex = Regex::new(r"_+").unwrap();
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CsvWriterConfig {
    #[serde(default = "default_csv_delimiter")]
    pub delimiter: char,
    #[serde(default)]
    pub escape: Option<char>,
    #[serde(default)]
    pub flexible: bool,
    #[serde(default = "default_csv_terminator")]
    pub terminator: CsvTerminator,
}

impl Default for CsvWriterConfig {
    fn default() -> Self {
        Self {
            delimiter: ',',
            escape: None,
            flexible: false,
            terminator: CsvTerminator::Any('\n'),
        }
    }
}

fn default_csv_delimiter() -> char {
    CsvWriterConfig::default().delimiter
}

fn default_csv_terminator() -> CsvTerminator {
    CsvWriterConfig::default().terminator
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum CsvTerminator {
    CRLF,
    Any(char),
}

impl From<CsvTerminator> for csv::Terminator {
    fn from(source: CsvTerminator) -> Self {
        match source {
            CsvTerminator::CRLF => Self::CRLF,
            CsvTerminator::Any(c) => Self::Any(c as u8),
        }
    }
}

impl From<&CsvWriterConfig> for csv::WriterBuilder {
    fn from(c: &CsvWriterConfig) -> Self {
        let mut builder = csv::WriterBuilder::new();
        builder.delimiter(c.delimiter as u8);
        builder.terminator(c.terminator.into());
        builder.flexible(c.flexible);
        if let Some(escape) = c.escape {
            builder.double_quote(false);
            builder.escape(escape as u8);
        } else {
            builder.double_quote(true);
        }
        builder
    }
}

/// File-system safe name: runs of anything but word characters, `-` and `.`
/// become a single `_`.
pub fn slugify(s: &str) -> String {
    let slug = NON_SLUG.replace_all(s.trim(), "_");
    let slug = UNDERSCORES.replace_all(&slug, "_");
    let slug: String = slug.trim_matches('_').chars().take(MAX_SLUG).collect();
    if slug.is_empty() {
        "page".to_string()
    } else {
        slug
    }
}

/// Output name of a source: host and path of a URL, or `<base>_<stem>` of a
/// local file (`local` without a base URL).
pub fn target_name(source: &str, base_url: Option<&str>) -> String {
    if let Ok(url) = Url::parse(source) {
        if matches!(url.scheme(), "http" | "https") {
            let host = url.host_str().unwrap_or_default();
            let name = match url.path() {
                "/" => host.to_string(),
                path => format!("{host}{path}"),
            };
            return slugify(&name);
        }
    }
    let stem = Path::new(source)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    slugify(&format!("{}_{stem}", base_url.unwrap_or("local")))
}

/// One line of the `pages.csv` crawl log
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageLogEntry {
    pub url: String,
    pub items: usize,
    pub extracted_at: DateTime<Utc>,
    pub error: Option<String>,
}

impl From<&PageRecord> for PageLogEntry {
    fn from(record: &PageRecord) -> Self {
        Self {
            url: record.url.clone(),
            items: record.data_items.len(),
            extracted_at: record.extracted_at,
            error: record.error.clone(),
        }
    }
}

/// Files written for one page
#[derive(Debug, Default)]
pub struct PageFiles {
    pub record: PathBuf,
    pub tables: Vec<PathBuf>,
}

fn segment_file(segment: Segment) -> &'static str {
    match segment {
        Segment::Accommodation => "accommodations.csv",
        Segment::Experience => "experiences.csv",
        Segment::Business => "businesses.csv",
    }
}

fn text(field: &Option<String>) -> String {
    field.clone().unwrap_or_default()
}

fn number<T: ToString>(field: &Option<T>) -> String {
    field.as_ref().map(ToString::to_string).unwrap_or_default()
}

/// Values of an entity in `ENTITY_COLUMNS` order
pub fn entity_row(e: &Entity) -> Vec<String> {
    vec![
        e.segment.map(|s| s.as_str().to_string()).unwrap_or_default(),
        text(&e.subtype),
        e.segment_source.as_str().to_string(),
        e.segment_score.to_string(),
        e.entity_type.clone(),
        text(&e.name),
        text(&e.legal_name),
        text(&e.description),
        text(&e.tourism_license),
        text(&e.tax_id),
        text(&e.url),
        e.same_as.join(";"),
        text(&e.telephone),
        text(&e.email),
        text(&e.price_range),
        number(&e.rating),
        number(&e.rating_count),
        text(&e.address_street),
        text(&e.address_locality),
        text(&e.address_region),
        text(&e.address_postal_code),
        text(&e.address_country),
        number(&e.lat),
        number(&e.lon),
        text(&e.checkin),
        text(&e.checkout),
        text(&e.event_start),
        text(&e.event_end),
        text(&e.schema_type),
        e.source_method.clone(),
        e.source_url.clone(),
        e.confidence.to_string(),
    ]
}

pub struct Exporter {
    config: ExtractConfig,
}

impl Exporter {
    pub fn new(config: ExtractConfig) -> anyhow::Result<Self> {
        fs::create_dir_all(&config.outdir)?;
        Ok(Self { config })
    }

    pub fn outdir(&self) -> &Path {
        &self.config.outdir
    }

    fn csv_writer(&self, path: &Path) -> anyhow::Result<csv::Writer<fs::File>> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(csv::WriterBuilder::from(&self.config.csv).from_writer(fs::File::create(path)?))
    }

    fn write_json<T: Serialize>(&self, path: &Path, value: &T) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = BufWriter::new(fs::File::create(path)?);
        serde_json::to_writer_pretty(&mut out, value)?;
        out.flush()?;
        Ok(())
    }

    fn write_table(&self, path: &Path, table: &Table) -> anyhow::Result<()> {
        let mut wtr = self.csv_writer(path)?;
        wtr.write_record(&table.schema)?;
        let width = table.schema.len();
        for row in &table.rows {
            let mut cells: Vec<String> = row.iter().take(width).map(ToString::to_string).collect();
            cells.resize(width, String::new());
            wtr.write_record(&cells)?;
        }
        wtr.flush()?;
        Ok(())
    }

    /// Writes the JSON record of a page and, when enabled, one CSV per table
    pub fn write_page(&self, record: &PageRecord, name: &str) -> anyhow::Result<PageFiles> {
        let (record_path, tables_dir) = match self.config.layout {
            RecordLayout::Flat => (
                self.outdir().join("pages").join(format!("{name}.json")),
                self.outdir().join("tables"),
            ),
            RecordLayout::Nested => {
                let root = self.outdir().join(name);
                (root.join("record.json"), root.join("tables"))
            }
        };
        self.write_json(&record_path, record)
            .with_context(|| format!("Couldn't write record of {}", record.url))?;

        let mut files = PageFiles {
            record: record_path,
            tables: Vec::new(),
        };
        if self.config.write_tables {
            for (n, table) in record.tables().enumerate() {
                let path = tables_dir.join(format!("{name}_{n}.csv"));
                self.write_table(&path, table)?;
                files.tables.push(path);
            }
        }
        Ok(files)
    }

    fn write_entity_csv<'a, I>(&self, path: &Path, entities: I) -> anyhow::Result<()>
    where
        I: IntoIterator<Item = &'a Entity>,
    {
        let mut wtr = self.csv_writer(path)?;
        wtr.write_record(ENTITY_COLUMNS)?;
        for entity in entities {
            wtr.write_record(entity_row(entity))?;
        }
        wtr.flush()?;
        Ok(())
    }

    /// Writes `entities.csv` and the per-segment files that have rows.
    /// Nothing is written without entities.
    pub fn write_entities(&self, entities: &[Entity]) -> anyhow::Result<Vec<PathBuf>> {
        let mut written = Vec::new();
        if entities.is_empty() {
            return Ok(written);
        }
        let path = self.outdir().join("entities.csv");
        self.write_entity_csv(&path, entities)?;
        written.push(path);

        if self.config.write_segments {
            for segment in Segment::ALL {
                let mut rows = entities.iter().filter(|e| e.segment == Some(segment)).peekable();
                if rows.peek().is_none() {
                    continue;
                }
                let path = self.outdir().join(segment_file(segment));
                self.write_entity_csv(&path, rows)?;
                written.push(path);
            }
        }
        Ok(written)
    }

    pub fn write_page_log(&self, entries: &[PageLogEntry]) -> anyhow::Result<PathBuf> {
        let path = self.outdir().join("pages.csv");
        let mut wtr = self.csv_writer(&path)?;
        if entries.is_empty() {
            wtr.write_record(["url", "items", "extractedAt", "error"])?;
        }
        for entry in entries {
            wtr.serialize(entry)?;
        }
        wtr.flush()?;
        Ok(path)
    }
}
