//! Extraction over independent pages: URLs fetched with bounded concurrency
//! and local HTML files.

use std::path::{Path, PathBuf};

use anyhow::Context;
use fs_err as fs;
use futures::stream::{self, StreamExt};
use tws_crawler::{decode_body, Fetcher, PageLocation, Scrapable, ScrapingContext};
use url::Url;

use crate::tourism::TourismScraper;

pub const DEFAULT_WORKERS: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Url(String),
    File { path: PathBuf, base_url: Option<String> },
}

impl Source {
    /// An http(s) URL, anything else is a local path
    pub fn parse(source: &str, base_url: Option<&str>) -> Self {
        let source = source.trim();
        match Url::parse(source) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => Self::Url(source.to_string()),
            _ => Self::File {
                path: PathBuf::from(source),
                base_url: base_url.map(String::from),
            },
        }
    }

    pub fn label(&self) -> String {
        match self {
            Self::Url(url) => url.clone(),
            Self::File { path, .. } => path.display().to_string(),
        }
    }
}

/// Sources listed one per line as `source[,baseURL]`, blank lines and
/// `#` comments skipped.
pub fn read_source_list(path: &Path) -> anyhow::Result<Vec<Source>> {
    let content = fs::read_to_string(path)?;
    Ok(parse_source_list(&content))
}

fn parse_source_list(content: &str) -> Vec<Source> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| match line.split_once(',') {
            Some((source, base)) => {
                let base = base.trim();
                Source::parse(source, Some(base).filter(|b| !b.is_empty()))
            }
            None => Source::parse(line, None),
        })
        .collect()
}

pub fn glob_sources(pattern: &str, base_url: Option<&str>) -> anyhow::Result<Vec<Source>> {
    let mut sources = Vec::new();
    for path in glob::glob(pattern)? {
        sources.push(Source::File {
            path: path?,
            base_url: base_url.map(String::from),
        });
    }
    Ok(sources)
}

#[derive(Debug, Default)]
pub struct BatchSummary {
    pub succeeded: usize,
    /// Source and reason
    pub failed: Vec<(String, String)>,
}

impl BatchSummary {
    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }
}

async fn load(fetcher: &Fetcher, source: &Source) -> anyhow::Result<(String, ScrapingContext)> {
    match source {
        Source::Url(url) => {
            if let Ok(parsed) = Url::parse(url) {
                if !fetcher.allowed(&parsed).await {
                    anyhow::bail!("Disallowed by robots.txt");
                }
            }
            let page = fetcher.fetch(url).await?;
            let ctx = ScrapingContext::new(PageLocation::Url(page.final_url), url.clone());
            Ok((page.html, ctx))
        }
        Source::File { path, base_url } => {
            let bytes = fs::read(path)?;
            let location = PageLocation::Path(path.clone());
            let ctx = match base_url {
                Some(base) => ScrapingContext::new(location, base.clone()),
                None => ScrapingContext::with_location(location),
            };
            Ok((decode_body(&bytes, None), ctx))
        }
    }
}

/// Loads up to `workers` sources at once, pages are scraped in completion
/// order. One failing source never stops the others.
pub async fn run_batch(
    fetcher: &Fetcher,
    sources: Vec<Source>,
    workers: usize,
    scraper: &mut TourismScraper,
) -> BatchSummary {
    let mut summary = BatchSummary::default();
    let mut loads = stream::iter(sources)
        .map(|source| async move {
            let loaded = load(fetcher, &source).await;
            (source, loaded)
        })
        .buffer_unordered(workers.max(1));

    while let Some((source, loaded)) = loads.next().await {
        let label = source.label();
        let result = loaded.and_then(|(html, ctx)| {
            scraper
                .scrap(html, ctx)
                .with_context(|| format!("Couldn't extract {label}"))
        });
        match result {
            Ok(()) => {
                log::info!("Processed {label}");
                summary.succeeded += 1;
            }
            Err(e) => {
                log::warn!("Failed {label}: {e:#}");
                scraper.record_failure(&label, format!("{e:#}"));
                summary.failed.push((label, format!("{e:#}")));
            }
        }
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_list_lines() {
        let sources = parse_source_list(
            "# seeds\nhttps://turismo.example.test/es\n\n  pages/hotel.html , https://turismo.example.test/ \nlocal.html\n",
        );
        assert_eq!(
            sources,
            vec![
                Source::Url("https://turismo.example.test/es".into()),
                Source::File {
                    path: PathBuf::from("pages/hotel.html"),
                    base_url: Some("https://turismo.example.test/".into()),
                },
                Source::File {
                    path: PathBuf::from("local.html"),
                    base_url: None,
                },
            ]
        );
    }

    #[test]
    fn urls_need_a_web_scheme() {
        assert!(matches!(Source::parse("ftp://host/file.html", None), Source::File { .. }));
        assert!(matches!(Source::parse("HTTPS://host/", None), Source::Url(_)));
    }
}
