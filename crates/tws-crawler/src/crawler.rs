use std::sync::Arc;

use anyhow::Result;
use url::Url;

use crate::config::{CrawlerConfig, OnError};
use crate::fetcher::{FetchResult, Fetcher};
use crate::frontier::Frontier;
use crate::links::{extract_links, normalize_with};
use crate::scrapable::{CrawlingContext, PageLocation, Scrapable, ScrapingContext};
use crate::sitemap::{discover_sitemaps, gather_urls, Sitemap};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlSummary {
    pub pages_crawled: usize,
    pub visited: usize,
    pub failed: Vec<String>,
    /// URLs left in the frontier when the page bound was reached
    pub remaining: usize,
}

/// Sequential crawler: one URL is fetched, scraped and its links enqueued
/// before the next one is dequeued.
pub struct Crawler {
    config: CrawlerConfig,
    fetcher: Arc<Fetcher>,
}

impl Crawler {
    pub fn new(config: CrawlerConfig) -> Result<Self> {
        let fetcher = Arc::new(Fetcher::new(config.fetch.clone())?);
        Ok(Self::with_fetcher(config, fetcher))
    }

    pub fn with_fetcher(config: CrawlerConfig, fetcher: Arc<Fetcher>) -> Self {
        Self { config, fetcher }
    }

    pub fn fetcher(&self) -> &Arc<Fetcher> {
        &self.fetcher
    }

    async fn seed_from_sitemaps<T>(&self, seeds: &[String], frontier: &mut Frontier, scraper: &T)
    where
        T: Scrapable,
    {
        let limit = self.config.effective_sitemap_limit();
        let mut seeded = 0;
        for seed in seeds {
            for sm_url in discover_sitemaps(&self.fetcher, seed).await {
                for page_url in gather_urls(&self.fetcher, &sm_url, limit).await {
                    if !scraper.accept(&page_url, CrawlingContext::Sitemap(Sitemap::Urlset)) {
                        continue;
                    }
                    match frontier.push_back(page_url) {
                        Ok(()) => seeded += 1,
                        Err(rejection) => log::debug!("Sitemap URL rejected: {rejection:?}"),
                    }
                }
            }
        }
        log::info!("Seeded {seeded} URLs from sitemaps");
    }

    pub async fn crawl<T>(&self, seeds: &[String], scraper: &mut T) -> Result<CrawlSummary>
    where
        T: Scrapable,
    {
        let mut frontier = Frontier::new(seeds, &self.config)?;
        if self.config.sitemap_first {
            self.seed_from_sitemaps(seeds, &mut frontier, scraper).await;
        }

        let max_pages = self.config.max_pages;
        let mut summary = CrawlSummary::default();

        while summary.pages_crawled < max_pages {
            let url = match frontier.pop() {
                Some(url) => url,
                None => break,
            };

            if let Ok(parsed) = Url::parse(&url) {
                if !self.fetcher.allowed(&parsed).await {
                    log::debug!("Disallowed by robots.txt: {url}");
                    continue;
                }
            }

            log::info!("GET {url}");
            let FetchResult { final_url, html } = match self.fetcher.fetch(&url).await {
                Ok(page) => page,
                Err(e) => match self.config.on_dl_error {
                    OnError::SkipAndLog => {
                        log::warn!("Skipping URL {url}: {e}");
                        scraper.failed(&url, &e);
                        summary.failed.push(url);
                        continue;
                    }
                    OnError::Fail => return Err(e.into()),
                },
            };

            if final_url != url {
                if let Some(target) = normalize_with(&final_url, &final_url, self.config.allow_query) {
                    frontier.mark_visited(&target);
                }
            }

            let links = extract_links(&html, &final_url, frontier.keywords(), self.config.allow_query);

            let ctx = ScrapingContext::new(PageLocation::Url(final_url.clone()), url.clone());
            if let Err(e) = scraper.scrap(html, ctx) {
                match self.config.on_scrap_error {
                    OnError::SkipAndLog => log::error!("Skipping scrap for page {final_url}: {e}"),
                    OnError::Fail => return Err(e),
                }
            }

            for link in links {
                if !scraper.accept(&link.url, CrawlingContext::Page(final_url.clone())) {
                    continue;
                }
                let next = link.url.clone();
                if let Err(rejection) = frontier.push(link.url) {
                    log::debug!("Link {next} rejected: {rejection:?}");
                }
            }

            summary.pages_crawled += 1;
            log::info!(
                "Progress {}/{max_pages} pages, {} queued",
                summary.pages_crawled,
                frontier.len()
            );

            let pause = self.config.page_pause();
            if !pause.is_zero() {
                tokio::time::sleep(pause).await;
            }
        }

        summary.visited = frontier.visited().len();
        summary.remaining = frontier.len();
        Ok(summary)
    }
}
