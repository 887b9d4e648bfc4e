use std::collections::HashSet;
use std::future::Future;
use std::io::prelude::*;
use std::pin::Pin;

use flate2::read::GzDecoder;
use lazy_static::lazy_static;
use sxd_document::{dom, parser};
use thiserror::Error;
use url::Url;

use crate::decode::decode_body;
use crate::fetcher::{FetchError, Fetcher};

lazy_static! {
    static ref XP_FACTORY: sxd_xpath::Factory = sxd_xpath::Factory::new();
}

/// Nested sitemap indexes are followed this deep at most
const MAX_DEPTH: usize = 4;

#[derive(Debug, Error)]
pub enum SitemapError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("Couldn't gunzip sitemap: {0}")]
    Gzip(#[from] std::io::Error),
    #[error("Malformed sitemap XML: {0}")]
    Xml(String),
    #[error("Unknown sitemap root element {0:?}")]
    UnknownRoot(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sitemap {
    Index,
    Urlset,
}

impl<'a> TryFrom<dom::Root<'a>> for Sitemap {
    type Error = SitemapError;

    fn try_from(root: dom::Root<'a>) -> Result<Self, Self::Error> {
        let kind = root
            .children()
            .into_iter()
            .find_map(|child| child.element())
            .map(|elem| elem.name().local_part().to_string())
            .unwrap_or_default();

        match kind.as_str() {
            "sitemapindex" => Ok(Self::Index),
            "urlset" => Ok(Self::Urlset),
            _ => Err(SitemapError::UnknownRoot(kind)),
        }
    }
}

/// Parses a sitemap document into its kind and `<loc>` values, namespaced or not
pub fn parse_sitemap(xml: &str) -> Result<(Sitemap, Vec<String>), SitemapError> {
    let package = parser::parse(xml).map_err(|e| SitemapError::Xml(e.to_string()))?;
    let document = package.as_document();
    let kind = Sitemap::try_from(document.root())?;

    let xpath = XP_FACTORY
        .build("//*[local-name()='loc']")
        .map_err(|e| SitemapError::Xml(e.to_string()))?
        .ok_or_else(|| SitemapError::Xml("Missing XPath".into()))?;
    let context = sxd_xpath::Context::new();
    let value = xpath
        .evaluate(&context, document.root())
        .map_err(|e| SitemapError::Xml(e.to_string()))?;

    let locs = match value {
        sxd_xpath::Value::Nodeset(nodes) => nodes
            .document_order()
            .into_iter()
            .map(|node| node.string_value().trim().to_string())
            .filter(|loc| !loc.is_empty())
            .collect(),
        _ => Vec::new(),
    };
    Ok((kind, locs))
}

fn gunzip(body: &[u8]) -> Result<String, SitemapError> {
    let mut gz = GzDecoder::new(body);
    let mut xml = String::new();
    gz.read_to_string(&mut xml)?;
    Ok(xml)
}

async fn download(fetcher: &Fetcher, sitemap_url: &str) -> Result<String, SitemapError> {
    let resp = fetcher.fetch_raw(sitemap_url).await?;
    let gzipped = sitemap_url.to_ascii_lowercase().ends_with(".gz")
        || matches!(
            resp.header("content-type"),
            Some(c) if c.contains("application/x-gzip") || c.contains("application/gzip")
        );
    // reqwest may already have removed a gzip Content-Encoding
    if gzipped && resp.body.starts_with(&[0x1f, 0x8b]) {
        gunzip(&resp.body)
    } else {
        Ok(decode_body(&resp.body, resp.header("content-type")))
    }
}

/// Candidate sitemaps of a site: robots.txt `Sitemap:` entries then `/sitemap.xml`
pub async fn discover_sitemaps(fetcher: &Fetcher, site_url: &str) -> Vec<String> {
    let url = match Url::parse(site_url) {
        Ok(url) => url,
        Err(_) => return Vec::new(),
    };
    let origin = url.origin().ascii_serialization();

    let mut sitemaps: Vec<String> = fetcher
        .declared_sitemaps(&url)
        .await
        .into_iter()
        .filter_map(|sm| url.join(&sm).ok().map(String::from))
        .collect();
    sitemaps.push(format!("{origin}/sitemap.xml"));

    let mut seen = HashSet::new();
    sitemaps.retain(|sm| seen.insert(sm.clone()));
    sitemaps
}

/// Page URLs reachable from `sitemap_url`, expanding sitemap indexes, at most
/// `limit` of them. Download or parse failures only end that branch.
pub async fn gather_urls(fetcher: &Fetcher, sitemap_url: &str, limit: usize) -> Vec<String> {
    let mut urls = Vec::new();
    let mut seen_sitemaps = HashSet::new();
    gather(fetcher, sitemap_url, limit, 0, &mut seen_sitemaps, &mut urls).await;

    let mut seen = HashSet::new();
    urls.retain(|u| seen.insert(u.clone()));
    urls
}

fn gather<'a>(
    fetcher: &'a Fetcher,
    sitemap_url: &'a str,
    limit: usize,
    depth: usize,
    seen_sitemaps: &'a mut HashSet<String>,
    urls: &'a mut Vec<String>,
) -> Pin<Box<dyn Future<Output = ()> + 'a>> {
    Box::pin(async move {
        if urls.len() >= limit || depth > MAX_DEPTH || !seen_sitemaps.insert(sitemap_url.to_string()) {
            return;
        }

        let parsed = match download(fetcher, sitemap_url).await {
            Ok(xml) => parse_sitemap(&xml),
            Err(e) => Err(e),
        };
        let (kind, locs) = match parsed {
            Ok(parsed) => parsed,
            Err(e) => {
                log::warn!("Skipping sitemap {sitemap_url}: {e}");
                return;
            }
        };

        match kind {
            Sitemap::Index => {
                for loc in locs {
                    if urls.len() >= limit {
                        break;
                    }
                    gather(fetcher, &loc, limit, depth + 1, seen_sitemaps, urls).await;
                }
            }
            Sitemap::Urlset => {
                let room = limit.saturating_sub(urls.len());
                urls.extend(locs.into_iter().take(room));
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_urlset() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
            <urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
              <url><loc>https://example.test/a</loc></url>
              <url><loc> https://example.test/b </loc><lastmod>2024-01-01</lastmod></url>
            </urlset>"#;
        let (kind, locs) = parse_sitemap(xml).unwrap();
        assert_eq!(kind, Sitemap::Urlset);
        assert_eq!(locs, ["https://example.test/a", "https://example.test/b"]);
    }

    #[test]
    fn parses_index_without_namespace() {
        let xml = "<sitemapindex><sitemap><loc>https://example.test/s1.xml.gz</loc></sitemap></sitemapindex>";
        let (kind, locs) = parse_sitemap(xml).unwrap();
        assert_eq!(kind, Sitemap::Index);
        assert_eq!(locs, ["https://example.test/s1.xml.gz"]);
    }

    #[test]
    fn malformed_xml_is_an_error() {
        assert!(matches!(parse_sitemap("<urlset><url>"), Err(SitemapError::Xml(_))));
        assert!(matches!(parse_sitemap("<html></html>"), Err(SitemapError::UnknownRoot(_))));
    }
}
