use std::path::PathBuf;

use crate::fetcher::FetchError;
use crate::sitemap::Sitemap;

/// Page processing logic plugged into the crawler
pub trait Scrapable {
    type Config: Clone + Send + 'static;

    fn new(config: &Self::Config) -> anyhow::Result<Self>
    where
        Self: Sized;

    /// Last word on a discovered URL, after the frontier policy accepted it
    fn accept(&self, _url: &str, _ctx: CrawlingContext) -> bool {
        true
    }

    fn scrap(&mut self, page: String, ctx: ScrapingContext) -> anyhow::Result<()>;

    /// Called when a page couldn't be fetched at all
    fn failed(&mut self, _url: &str, _error: &FetchError) {}

    fn finalizer(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageLocation {
    Url(String),
    Path(PathBuf),
}

impl PageLocation {
    /// Base URL for resolving links, a local file has none
    pub fn base_url(&self) -> Option<&str> {
        match self {
            Self::Url(url) => Some(url),
            Self::Path(_) => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScrapingContext {
    location: PageLocation,
    requested_url: Option<String>,
}

impl ScrapingContext {
    pub fn new(location: PageLocation, requested_url: impl Into<String>) -> Self {
        Self {
            location,
            requested_url: Some(requested_url.into()),
        }
    }

    pub fn with_location(location: PageLocation) -> Self {
        Self {
            location,
            requested_url: None,
        }
    }

    pub fn location(&self) -> &PageLocation {
        &self.location
    }

    /// URL handed to the fetcher before redirects, or the base URL a local
    /// file was given
    pub fn requested_url(&self) -> Option<&str> {
        self.requested_url.as_deref()
    }
}

#[derive(Debug, Clone)]
pub enum CrawlingContext {
    Page(String),
    Sitemap(Sitemap),
}
