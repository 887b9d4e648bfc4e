use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_KEYWORDS: &str = concat!(
    r"hotel|alojamiento|apartament|hostal|camping|rural|restauran|gastronom|bar|caf[eé]|",
    r"atracci|museo|playa|monumento|ruta|sender|que-?ver|agenda|evento|fest|activ|ocio|turism"
);

pub const DEFAULT_DENY: &str =
    r"\.(pdf|jpg|jpeg|png|gif|svg|webp|ico|zip|rar|7z|mp4|mp3|wav)$";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlerConfig {
    #[serde(default)]
    pub fetch: FetchConfig,

    #[serde(default = "default_max_pages")]
    pub max_pages: usize,

    #[serde(default = "default_same_domain")]
    pub same_domain: bool,

    /// Regex a URL must match to be crawled
    #[serde(default)]
    pub allow: Option<String>,

    /// Regex rejecting URLs from the frontier
    #[serde(default = "default_deny")]
    pub deny: Option<String>,

    /// Regex of relevant terms, matching URLs jump the queue
    #[serde(default = "default_keywords")]
    pub keywords: String,

    #[serde(default = "default_page_pause_secs")]
    pub page_pause_secs: f32,

    #[serde(default)]
    pub sitemap_first: bool,

    /// Upper bound of URLs taken from sitemaps, 0 means twice `max_pages`
    #[serde(default)]
    pub sitemap_limit: usize,

    #[serde(default = "default_allow_query")]
    pub allow_query: bool,

    #[serde(default = "default_on_dl_error")]
    pub on_dl_error: OnError,

    #[serde(default = "default_on_scrap_error")]
    pub on_scrap_error: OnError,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            fetch: FetchConfig::default(),
            max_pages: default_max_pages(),
            same_domain: default_same_domain(),
            allow: None,
            deny: default_deny(),
            keywords: default_keywords(),
            page_pause_secs: default_page_pause_secs(),
            sitemap_first: false,
            sitemap_limit: 0,
            allow_query: default_allow_query(),
            on_dl_error: default_on_dl_error(),
            on_scrap_error: default_on_scrap_error(),
        }
    }
}

impl CrawlerConfig {
    pub fn page_pause(&self) -> Duration {
        secs(self.page_pause_secs)
    }

    pub fn effective_sitemap_limit(&self) -> usize {
        if self.sitemap_limit == 0 {
            self.max_pages.saturating_mul(2)
        } else {
            self.sitemap_limit
        }
    }
}

fn default_max_pages() -> usize {
    200
}

fn default_same_domain() -> bool {
    true
}

fn default_deny() -> Option<String> {
    Some(DEFAULT_DENY.to_string())
}

fn default_keywords() -> String {
    DEFAULT_KEYWORDS.to_string()
}

fn default_page_pause_secs() -> f32 {
    0.3
}

fn default_allow_query() -> bool {
    true
}

fn default_on_dl_error() -> OnError {
    OnError::SkipAndLog
}

fn default_on_scrap_error() -> OnError {
    OnError::SkipAndLog
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_accept_language")]
    pub accept_language: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: f32,

    /// Minimum gap between two requests to the same host
    #[serde(default = "default_min_delay_secs")]
    pub min_delay_secs: f32,

    /// Jitter on the per-host gap is drawn from `[0, max_delay - min_delay)`
    #[serde(default = "default_max_delay_secs")]
    pub max_delay_secs: f32,

    /// Retries beyond the first attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Upper bound of the random jitter added to retry backoffs
    #[serde(default = "default_retry_jitter_secs")]
    pub retry_jitter_secs: f32,

    #[serde(default = "default_cache_dir")]
    pub cache_dir: Option<PathBuf>,

    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    #[serde(default = "default_stale_if_error")]
    pub stale_if_error: bool,

    #[serde(default = "default_respect_robots")]
    pub respect_robots: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            accept_language: default_accept_language(),
            timeout_secs: default_timeout_secs(),
            min_delay_secs: default_min_delay_secs(),
            max_delay_secs: default_max_delay_secs(),
            max_retries: default_max_retries(),
            retry_jitter_secs: default_retry_jitter_secs(),
            cache_dir: default_cache_dir(),
            cache_ttl_secs: default_cache_ttl_secs(),
            stale_if_error: default_stale_if_error(),
            respect_robots: default_respect_robots(),
        }
    }
}

impl FetchConfig {
    pub fn timeout(&self) -> Duration {
        secs(self.timeout_secs)
    }

    pub fn min_delay(&self) -> Duration {
        secs(self.min_delay_secs)
    }

    /// Width of the random jitter window applied on top of the per-host gap
    pub fn jitter_window(&self) -> Duration {
        secs(self.max_delay_secs - self.min_delay_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

fn default_user_agent() -> String {
    String::from(concat!(
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) ",
        "AppleWebKit/537.36 (KHTML, like Gecko) ",
        "Chrome/124.0.0.0 Safari/537.36"
    ))
}

fn default_accept_language() -> String {
    String::from("es-ES,es;q=0.9")
}

fn default_timeout_secs() -> f32 {
    25.0
}

fn default_min_delay_secs() -> f32 {
    3.0
}

fn default_max_delay_secs() -> f32 {
    8.0
}

fn default_max_retries() -> u32 {
    4
}

fn default_retry_jitter_secs() -> f32 {
    1.0
}

fn default_cache_dir() -> Option<PathBuf> {
    Some(PathBuf::from(".http_cache"))
}

fn default_cache_ttl_secs() -> u64 {
    3600
}

fn default_stale_if_error() -> bool {
    true
}

fn default_respect_robots() -> bool {
    true
}

/// Longest delay any setting can express, one day
const MAX_SECS: f32 = 86_400.0;

/// Negative or non finite values collapse to zero, larger ones than
/// `MAX_SECS` are capped
pub(crate) fn secs(value: f32) -> Duration {
    if value.is_finite() && value > 0.0 {
        Duration::from_secs_f32(value.min(MAX_SECS))
    } else {
        Duration::ZERO
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum OnError {
    Fail,
    SkipAndLog,
}
