use std::collections::{HashSet, VecDeque};

use anyhow::anyhow;
use regex::{Regex, RegexBuilder};

use crate::config::CrawlerConfig;
use crate::links::{netloc_of, normalize_with};

/// Why a URL was kept out of the frontier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    Visited,
    Queued,
    OffDomain,
    Denied,
    NotAllowed,
}

/// Queue of URLs still to visit plus the set already dequeued.
///
/// Relevant URLs (matching the keyword regex) are pushed to the front and
/// everything else to the back. Queued entries are never re-ordered, so this
/// is a best-effort priority BFS rather than a scored heap.
#[derive(Debug)]
pub struct Frontier {
    queue: VecDeque<String>,
    queued: HashSet<String>,
    visited: HashSet<String>,
    allowed_hosts: HashSet<String>,
    same_domain: bool,
    allow: Option<Regex>,
    deny: Option<Regex>,
    priority: Regex,
}

pub(crate) fn build_regex(pattern: &str) -> anyhow::Result<Regex> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|e| anyhow!("Invalid regex {pattern:?}: {e}"))
}

fn optional_regex(pattern: Option<&str>) -> anyhow::Result<Option<Regex>> {
    pattern
        .filter(|p| !p.is_empty())
        .map(build_regex)
        .transpose()
}

impl Frontier {
    /// Creates a frontier seeded with `seeds`, the allowed hosts of a
    /// same-domain crawl are the seeds' hosts. Fails without a valid seed.
    pub fn new(seeds: &[String], config: &CrawlerConfig) -> anyhow::Result<Self> {
        let seeds: Vec<String> = seeds
            .iter()
            .filter_map(|s| normalize_with(s, s, config.allow_query))
            .collect();
        if seeds.is_empty() {
            anyhow::bail!("No valid http(s) seed URL");
        }

        let mut frontier = Self {
            queue: VecDeque::new(),
            queued: HashSet::new(),
            visited: HashSet::new(),
            allowed_hosts: seeds.iter().filter_map(|s| netloc_of(s)).collect(),
            same_domain: config.same_domain,
            allow: optional_regex(config.allow.as_deref())?,
            deny: optional_regex(config.deny.as_deref())?,
            priority: build_regex(&config.keywords)?,
        };
        for seed in seeds {
            if frontier.queued.insert(seed.clone()) {
                frontier.queue.push_back(seed);
            }
        }
        Ok(frontier)
    }

    pub fn keywords(&self) -> &Regex {
        &self.priority
    }

    /// Domain, deny and allow policy, independent of queue state
    pub fn check_policy(&self, url: &str) -> Result<(), Rejection> {
        if self.same_domain {
            match netloc_of(url) {
                Some(host) if self.allowed_hosts.contains(&host) => (),
                _ => return Err(Rejection::OffDomain),
            }
        }
        if matches!(&self.deny, Some(deny) if deny.is_match(url)) {
            return Err(Rejection::Denied);
        }
        if matches!(&self.allow, Some(allow) if !allow.is_match(url)) {
            return Err(Rejection::NotAllowed);
        }
        Ok(())
    }

    pub fn check(&self, url: &str) -> Result<(), Rejection> {
        if self.visited.contains(url) {
            return Err(Rejection::Visited);
        }
        if self.queued.contains(url) {
            return Err(Rejection::Queued);
        }
        self.check_policy(url)
    }

    /// Enqueues a discovered link, relevant ones at the front
    pub fn push(&mut self, url: String) -> Result<(), Rejection> {
        self.check(&url)?;
        self.queued.insert(url.clone());
        if self.priority.is_match(&url) {
            self.queue.push_front(url);
        } else {
            self.queue.push_back(url);
        }
        Ok(())
    }

    /// Enqueues at the back regardless of relevance (sitemap seeding)
    pub fn push_back(&mut self, url: String) -> Result<(), Rejection> {
        self.check(&url)?;
        self.queued.insert(url.clone());
        self.queue.push_back(url);
        Ok(())
    }

    /// Next URL to visit, marked visited. Seeds that fail the policy are
    /// dropped here since they bypass the admission check.
    pub fn pop(&mut self) -> Option<String> {
        while let Some(url) = self.queue.pop_front() {
            self.queued.remove(&url);
            if self.visited.contains(&url) {
                continue;
            }
            if let Err(rejection) = self.check_policy(&url) {
                log::debug!("Skipping {url}: {rejection:?}");
                continue;
            }
            self.visited.insert(url.clone());
            return Some(url);
        }
        None
    }

    /// Records a URL reached without being dequeued, a redirect target.
    /// Returns whether it was new.
    pub fn mark_visited(&mut self, url: &str) -> bool {
        self.visited.insert(url.to_string())
    }

    pub fn visited(&self) -> &HashSet<String> {
        &self.visited
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeds_are_normalized() {
        let seeds = [
            "https://example.test".to_string(),
            "https://example.test/#inicio".to_string(),
            "mailto:info@example.test".to_string(),
        ];
        let mut frontier = Frontier::new(&seeds, &CrawlerConfig::default()).unwrap();
        assert_eq!(frontier.len(), 1);
        assert_eq!(frontier.pop().as_deref(), Some("https://example.test/"));
        assert_eq!(frontier.push("https://example.test/".into()), Err(Rejection::Visited));
    }

    #[test]
    fn redirect_targets_are_not_queued_again() {
        let mut frontier = Frontier::new(&["https://example.test/".to_string()], &CrawlerConfig::default()).unwrap();
        frontier.pop();
        assert!(frontier.mark_visited("https://example.test/es/"));
        assert_eq!(frontier.push("https://example.test/es/".into()), Err(Rejection::Visited));
    }
}
