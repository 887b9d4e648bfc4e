use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;

use crate::transport::RawResponse;

/// On-disk cache of successful GET responses keyed by (method, URL).
///
/// Every entry is two files: `<key>.body` with the raw bytes and `<key>.json`
/// with the metadata. Both are written through a temp file and renamed, the
/// metadata last, so concurrent readers never observe a partial entry.
#[derive(Debug, Clone)]
pub struct ResponseCache {
    dir: PathBuf,
    ttl: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EntryMeta {
    method: String,
    url: String,
    final_url: String,
    status: u16,
    headers: Vec<(String, String)>,
    stored_at: u64,
}

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub response: RawResponse,
    pub fresh: bool,
}

impl ResponseCache {
    pub fn open(dir: impl Into<PathBuf>, ttl: Duration) -> io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir, ttl })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn key(method: &str, url: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(method.as_bytes());
        hasher.update(b" ");
        hasher.update(url.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Returns the entry for `url`, fresh or expired; `None` when absent or unreadable
    pub fn lookup(&self, url: &str) -> Option<CacheEntry> {
        let key = Self::key("GET", url);
        let meta = fs::read(self.dir.join(format!("{key}.json"))).ok()?;
        let meta: EntryMeta = match serde_json::from_slice(&meta) {
            Ok(meta) => meta,
            Err(e) => {
                log::debug!("Ignoring corrupt cache entry for {url}: {e}");
                return None;
            }
        };
        if meta.url != url || meta.method != "GET" {
            return None;
        }
        let body = fs::read(self.dir.join(format!("{key}.body"))).ok()?;
        let age = now_secs().saturating_sub(meta.stored_at);
        Some(CacheEntry {
            fresh: age < self.ttl.as_secs(),
            response: RawResponse {
                status: meta.status,
                final_url: meta.final_url,
                headers: meta.headers,
                body,
            },
        })
    }

    pub fn store(&self, url: &str, response: &RawResponse) -> io::Result<()> {
        let key = Self::key("GET", url);
        let meta = EntryMeta {
            method: "GET".into(),
            url: url.to_string(),
            final_url: response.final_url.clone(),
            status: response.status,
            headers: response.headers.clone(),
            stored_at: now_secs(),
        };
        let meta = serde_json::to_vec(&meta).map_err(io::Error::other)?;
        self.write_atomic(&format!("{key}.body"), &response.body)?;
        self.write_atomic(&format!("{key}.json"), &meta)
    }

    fn write_atomic(&self, name: &str, bytes: &[u8]) -> io::Result<()> {
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(bytes)?;
        tmp.persist(self.dir.join(name)).map_err(|e| e.error)?;
        Ok(())
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(body: &str) -> RawResponse {
        RawResponse {
            status: 200,
            final_url: "https://example.test/final".into(),
            headers: vec![("content-type".into(), "text/html; charset=utf-8".into())],
            body: body.as_bytes().to_vec(),
        }
    }

    #[test]
    fn stores_and_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ResponseCache::open(dir.path(), Duration::from_secs(60)).unwrap();
        cache.store("https://example.test/", &response("<p>hi</p>")).unwrap();

        let entry = cache.lookup("https://example.test/").unwrap();
        assert!(entry.fresh);
        assert_eq!(entry.response.body, b"<p>hi</p>");
        assert_eq!(entry.response.final_url, "https://example.test/final");
        assert!(cache.lookup("https://example.test/other").is_none());
    }

    #[test]
    fn zero_ttl_entries_are_stale() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ResponseCache::open(dir.path(), Duration::ZERO).unwrap();
        cache.store("https://example.test/", &response("x")).unwrap();
        assert!(!cache.lookup("https://example.test/").unwrap().fresh);
    }
}
