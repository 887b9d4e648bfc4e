mod cache;
mod config;
mod crawler;
mod decode;
mod fetcher;
mod frontier;
mod links;
mod robots;
mod scrapable;
mod sitemap;
mod throttle;
mod transport;

pub use cache::{CacheEntry, ResponseCache};
pub use config::{CrawlerConfig, FetchConfig, OnError, DEFAULT_DENY, DEFAULT_KEYWORDS};
pub use crawler::{CrawlSummary, Crawler};
pub use decode::{decode_body, repair_mojibake};
pub use fetcher::{FetchError, FetchResult, Fetcher, MAX_BACKOFF};
pub use frontier::{Frontier, Rejection};
pub use links::{extract_links, netloc, netloc_of, normalize, normalize_with, same_host, strip_tracking, ScoredLink};
pub use robots::RobotsCache;
pub use scrapable::{CrawlingContext, PageLocation, Scrapable, ScrapingContext};
pub use sitemap::{discover_sitemaps, gather_urls, parse_sitemap, Sitemap, SitemapError};
pub use throttle::{jitter, HostThrottle};
pub use transport::{HttpTransport, RawResponse, Request, Transport};

pub use anyhow;
