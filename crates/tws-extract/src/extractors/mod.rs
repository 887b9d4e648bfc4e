use thiserror::Error;

use crate::item::DataItem;

mod domain_table;
mod html_table;
mod listing;
mod structured;
mod table;

pub use domain_table::DomainTables;
pub use html_table::HtmlTables;
pub use listing::Listings;
pub use structured::StructuredEntities;

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Invalid selector: {0}")]
    Selector(String),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("Malformed input: {0}")]
    Malformed(String),
}

/// One extraction strategy, run over the HTML of a page fetched from `base_url`
pub trait Extractor: Send + Sync {
    /// Label recorded in the page's method chain
    fn name(&self) -> &'static str;

    fn extract(&self, html: &str, base_url: &str) -> Result<Vec<DataItem>, ExtractionError>;
}
