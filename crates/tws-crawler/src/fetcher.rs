use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use url::Url;

use crate::cache::ResponseCache;
use crate::config::{secs, FetchConfig};
use crate::decode::decode_body;
use crate::links::netloc;
use crate::robots::RobotsCache;
use crate::throttle::{jitter, HostThrottle};
use crate::transport::{HttpTransport, RawResponse, Request, Transport};

/// Upper bound of a single retry wait, server hints included
pub const MAX_BACKOFF: Duration = Duration::from_secs(300);

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Invalid URL {0}")]
    InvalidUrl(String),
    #[error("{url} returned status {status}")]
    Status { url: String, status: u16 },
    #[error("Failed to fetch {url} after {attempts} attempts: {last}")]
    Exhausted {
        url: String,
        attempts: u32,
        last: String,
    },
}

#[derive(Debug, Clone)]
pub struct FetchResult {
    pub final_url: String,
    pub html: String,
}

/// Polite single-page HTTP GET.
///
/// Requests to one host are spaced by `max(min_delay, robots crawl-delay)`
/// plus jitter, 429/503/403 and transport failures are retried with backoff,
/// and successful responses go to the on-disk cache. A fresh cache hit is
/// served without touching the per-host throttle.
///
/// All methods take `&self`: one `Fetcher` can be shared between concurrent
/// workers, the throttle and robots state are internally synchronized.
pub struct Fetcher {
    config: FetchConfig,
    transport: Arc<dyn Transport>,
    throttle: HostThrottle,
    robots: RobotsCache,
    cache: Option<ResponseCache>,
}

impl Fetcher {
    pub fn new(config: FetchConfig) -> anyhow::Result<Self> {
        let transport = HttpTransport::new(
            &config.user_agent,
            &config.accept_language,
            config.timeout(),
        )?;
        Self::with_transport(config, Arc::new(transport))
    }

    pub fn with_transport(config: FetchConfig, transport: Arc<dyn Transport>) -> anyhow::Result<Self> {
        let cache = match &config.cache_dir {
            Some(dir) => Some(ResponseCache::open(dir, config.cache_ttl())?),
            None => None,
        };
        Ok(Self {
            robots: RobotsCache::new(config.user_agent.clone()),
            throttle: HostThrottle::new(),
            config,
            transport,
            cache,
        })
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    pub fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }

    pub fn throttle(&self) -> &HostThrottle {
        &self.throttle
    }

    /// Fetches `url` and decodes the body, returns the post-redirect URL and text
    pub async fn fetch(&self, url: &str) -> Result<FetchResult, FetchError> {
        let resp = self.fetch_raw(url).await?;
        let html = decode_body(&resp.body, resp.header("content-type"));
        Ok(FetchResult {
            final_url: resp.final_url,
            html,
        })
    }

    pub async fn fetch_raw(&self, url: &str) -> Result<RawResponse, FetchError> {
        let parsed = Url::parse(url).map_err(|_| FetchError::InvalidUrl(url.to_string()))?;

        let cached = self.cache.as_ref().and_then(|c| c.lookup(url));
        if let Some(entry) = &cached {
            if entry.fresh {
                log::debug!("Cache hit: {url}");
                return Ok(entry.response.clone());
            }
        }
        let stale = cached.map(|entry| entry.response);

        self.throttle_host(&parsed).await;

        let min_delay = self.config.min_delay();
        let retry_jitter = secs(self.config.retry_jitter_secs);
        let attempts = self.config.max_retries + 1;
        let mut last_err = String::from("no attempt made");

        for attempt in 1..=attempts {
            let mut request = Request::get(url);
            if attempt == 1 {
                request = request.with_referer(format!("{}/", parsed.origin().ascii_serialization()));
            }

            let pause = match self.transport.get(request).await {
                Ok(resp) => match resp.status {
                    200 => {
                        self.store(url, &resp);
                        return Ok(resp);
                    }
                    304 => return Ok(stale.clone().unwrap_or(resp)),
                    429 | 503 => {
                        let wait = retry_after(&resp).unwrap_or_else(|| backoff(min_delay, 2.0, attempt));
                        log::warn!(
                            "{} received for {url}, waiting {:.1}s (attempt {attempt})",
                            resp.status,
                            wait.as_secs_f32()
                        );
                        last_err = format!("status {}", resp.status);
                        wait + jitter(retry_jitter)
                    }
                    403 => {
                        let wait = backoff(min_delay, 1.5, attempt) + jitter(retry_jitter);
                        log::warn!(
                            "403 received for {url}, backing off {:.1}s (attempt {attempt})",
                            wait.as_secs_f32()
                        );
                        last_err = String::from("status 403");
                        wait
                    }
                    status if (200..300).contains(&status) => return Ok(resp),
                    status => {
                        return Err(FetchError::Status {
                            url: url.to_string(),
                            status,
                        })
                    }
                },
                Err(e) => {
                    if self.config.stale_if_error {
                        if let Some(resp) = &stale {
                            log::warn!("Serving stale cache entry for {url} after error: {e}");
                            return Ok(resp.clone());
                        }
                    }
                    let wait = backoff(min_delay, 2.0, attempt) + jitter(retry_jitter);
                    log::warn!(
                        "Error fetching {url}: {e}, retrying in {:.1}s (attempt {attempt})",
                        wait.as_secs_f32()
                    );
                    last_err = e.to_string();
                    wait
                }
            };

            if attempt < attempts {
                tokio::time::sleep(pause).await;
            }
        }

        Err(FetchError::Exhausted {
            url: url.to_string(),
            attempts,
            last: last_err,
        })
    }

    async fn throttle_host(&self, url: &Url) {
        let crawl_delay = if self.config.respect_robots {
            self.robots.crawl_delay(self.transport(), url).await
        } else {
            Duration::ZERO
        };
        let gap = self.config.min_delay().max(crawl_delay) + jitter(self.config.jitter_window());
        self.throttle.wait(&netloc(url), gap).await;
    }

    fn store(&self, url: &str, resp: &RawResponse) {
        if let Some(cache) = &self.cache {
            if let Err(e) = cache.store(url, resp) {
                log::warn!("Couldn't cache {url} in {}: {e}", cache.dir().display());
            }
        }
    }

    /// Whether robots rules of the URL's origin let it be crawled
    pub async fn allowed(&self, url: &Url) -> bool {
        !self.config.respect_robots || self.robots.allowed(self.transport(), url).await
    }

    /// `Sitemap:` entries declared in the robots.txt of the URL's origin
    pub async fn declared_sitemaps(&self, url: &Url) -> Vec<String> {
        self.robots.sitemaps(self.transport(), url).await
    }
}

/// `Retry-After` in delay-seconds, capped at `MAX_BACKOFF`. HTTP-date values
/// are ignored.
fn retry_after(resp: &RawResponse) -> Option<Duration> {
    resp.header("retry-after")
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(|s| Duration::from_secs(s).min(MAX_BACKOFF))
}

/// `base * factor^attempt`, capped at `MAX_BACKOFF`
fn backoff(base: Duration, factor: f64, attempt: u32) -> Duration {
    let exponent = attempt.min(64) as i32;
    Duration::try_from_secs_f64(base.as_secs_f64() * factor.powi(exponent))
        .unwrap_or(MAX_BACKOFF)
        .min(MAX_BACKOFF)
}
