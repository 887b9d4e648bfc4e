pub mod batch;
pub mod classify;
pub mod config;
pub mod dedup;
mod dom;
pub mod export;
pub mod extractors;
pub mod item;
mod patterns;
pub mod pipeline;
mod fields;
pub mod record;
mod tourism;

pub use batch::{glob_sources, read_source_list, run_batch, BatchSummary, Source, DEFAULT_WORKERS};
pub use config::{ExtractConfig, RecordLayout};
pub use dedup::{dedupe, identity_key};
pub use export::{CsvTerminator, CsvWriterConfig, Exporter};
pub use item::{Cell, DataItem, Entity, Segment, SegmentSource, Table};
pub use pipeline::Pipeline;
pub use record::{PageRecord, RecordMeta};
pub use tourism::{ExportReport, TourismScraper};

pub use anyhow;
