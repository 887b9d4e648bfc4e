use std::collections::HashSet;
use std::path::{Path, PathBuf};

use fs_err as fs;
use tws_crawler::{FetchError, PageLocation, Scrapable, ScrapingContext};
use url::Url;

use crate::config::ExtractConfig;
use crate::dedup::dedupe;
use crate::export::{target_name, Exporter, PageFiles, PageLogEntry};
use crate::item::Entity;
use crate::pipeline::Pipeline;
use crate::record::PageRecord;

/// What a scraping session wrote
#[derive(Debug, Default)]
pub struct ExportReport {
    pub pages: usize,
    pub failed: usize,
    /// Entities left after deduplication, set by the finalizer
    pub entities: usize,
    pub tables: usize,
    /// Aggregate files: entity CSVs and the page log
    pub files: Vec<PathBuf>,
}

/// Runs the extraction pipeline over every page handed to it, exports one
/// record per page and, once finalized, the deduplicated entities.
pub struct TourismScraper {
    pipeline: Pipeline,
    exporter: Exporter,
    entities: Vec<Entity>,
    pages: Vec<PageLogEntry>,
    names: HashSet<String>,
    report: ExportReport,
}

fn file_url(path: &Path) -> String {
    fs::canonicalize(path)
        .ok()
        .and_then(|p| Url::from_file_path(p).ok())
        .map(String::from)
        .unwrap_or_else(|| format!("file://{}", path.display()))
}

impl TourismScraper {
    pub fn with_pipeline(config: &ExtractConfig, pipeline: Pipeline) -> anyhow::Result<Self> {
        Ok(Self {
            pipeline,
            exporter: Exporter::new(config.clone())?,
            entities: Vec::new(),
            pages: Vec::new(),
            names: HashSet::new(),
            report: ExportReport::default(),
        })
    }

    /// Distinct output name, later pages slugging alike get a counter suffix
    /// `name`, or the first `name_N` not given to an earlier page
    fn unique_name(&mut self, name: String) -> String {
        let mut candidate = name.clone();
        let mut n = 0;
        while self.names.contains(&candidate) {
            n += 1;
            candidate = format!("{name}_{n}");
        }
        self.names.insert(candidate.clone());
        candidate
    }

    /// Exports an assembled record and keeps its entities for the final files
    pub fn ingest(&mut self, record: PageRecord, name: String) -> anyhow::Result<PageFiles> {
        let name = self.unique_name(name);
        let files = self.exporter.write_page(&record, &name)?;
        log::debug!(
            "{} items from {} via {}",
            record.meta.count,
            record.url,
            record.meta.method_chain.join(" > ")
        );

        self.report.pages += 1;
        self.report.tables += files.tables.len();
        self.pages.push(PageLogEntry::from(&record));
        self.entities.extend(record.entities().cloned());
        Ok(files)
    }

    pub fn record_failure(&mut self, url: &str, error: impl ToString) {
        let record = PageRecord::failed(url, error);
        self.report.failed += 1;
        self.pages.push(PageLogEntry::from(&record));
    }

    /// Entities gathered so far, deduplicated once finalized
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn report(&self) -> &ExportReport {
        &self.report
    }
}

impl Scrapable for TourismScraper {
    type Config = ExtractConfig;

    fn new(config: &ExtractConfig) -> anyhow::Result<Self> {
        Self::with_pipeline(config, Pipeline::default())
    }

    fn scrap(&mut self, page: String, ctx: ScrapingContext) -> anyhow::Result<()> {
        let (record, name) = match ctx.location() {
            PageLocation::Url(url) => (self.pipeline.process("fetch", url, &page), target_name(url, None)),
            PageLocation::Path(path) => {
                let base_url = ctx.requested_url();
                let url = base_url.map(String::from).unwrap_or_else(|| file_url(path));
                let name = target_name(&path.to_string_lossy(), base_url);
                (self.pipeline.process("file", &url, &page), name)
            }
        };
        self.ingest(record, name)?;
        Ok(())
    }

    fn failed(&mut self, url: &str, error: &FetchError) {
        self.record_failure(url, error);
    }

    fn finalizer(&mut self) -> anyhow::Result<()> {
        let found = self.entities.len();
        self.entities = dedupe(std::mem::take(&mut self.entities));
        log::info!("{} unique entities out of {found}", self.entities.len());

        self.report.entities = self.entities.len();
        self.report.files = self.exporter.write_entities(&self.entities)?;
        self.report.files.push(self.exporter.write_page_log(&self.pages)?);
        Ok(())
    }
}
