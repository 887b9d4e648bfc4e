use lazy_static::lazy_static;
use regex::Regex;
use scraper::{Html, Selector};
use url::Url;

const TRACKING_PARAMS: [&str; 7] = ["gclid", "fbclid", "mc_cid", "mc_eid", "msclkid", "ref", "igshid"];
const TRACKING_PREFIX: &str = "utm_";

lazy_static! {
    static ref ANCHORS: Selector = Selector::parse("a[href]").unwrap();
}

/// Resolves `href` against `base` into an absolute http(s) URL without fragment
pub fn normalize(base: &str, href: &str) -> Option<String> {
    normalize_with(base, href, true)
}

/// Same as [`normalize`], dropping the query string unless `keep_query`
pub fn normalize_with(base: &str, href: &str, keep_query: bool) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }
    let lowered = href.to_ascii_lowercase();
    if ["mailto:", "tel:", "javascript:"]
        .iter()
        .any(|scheme| lowered.starts_with(scheme))
    {
        return None;
    }

    let mut url = match Url::parse(base) {
        Ok(base) => base.join(href).ok()?,
        Err(_) => Url::parse(href).ok()?,
    };
    if url.scheme() != "http" && url.scheme() != "https" {
        return None;
    }
    url.set_fragment(None);
    if !keep_query {
        url.set_query(None);
    }
    Some(url.into())
}

/// `host[:port]` of a URL, the port only when it is not the scheme default
pub fn netloc(url: &Url) -> String {
    match (url.host_str(), url.port()) {
        (Some(host), Some(port)) => format!("{host}:{port}"),
        (Some(host), None) => host.to_string(),
        (None, _) => String::new(),
    }
}

pub fn netloc_of(url: &str) -> Option<String> {
    Url::parse(url).ok().map(|u| netloc(&u))
}

pub fn same_host(u: &str, v: &str) -> bool {
    match (netloc_of(u), netloc_of(v)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

/// Removes the fragment and tracking parameters (`utm_*`, click ids, `ref`),
/// used when grouping or deduplicating URLs rather than crawling them.
pub fn strip_tracking(url: &str, keep_query: bool) -> String {
    let mut parsed = match Url::parse(url) {
        Ok(parsed) => parsed,
        Err(_) => return url.to_string(),
    };
    parsed.set_fragment(None);
    if !keep_query {
        parsed.set_query(None);
        return parsed.into();
    }
    let kept: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(k, _)| !k.starts_with(TRACKING_PREFIX) && !TRACKING_PARAMS.contains(&k.as_ref()))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if kept.is_empty() {
        parsed.set_query(None);
    } else {
        parsed.query_pairs_mut().clear().extend_pairs(kept);
    }
    parsed.into()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoredLink {
    pub url: String,
    pub score: u8,
}

/// Links of a page, highest score first. A link scores 3 when its URL, text
/// or title matches `keywords`, 1 otherwise; ties keep document order.
pub fn extract_links(html: &str, base_url: &str, keywords: &Regex, keep_query: bool) -> Vec<ScoredLink> {
    let document = Html::parse_document(html);
    let mut links: Vec<ScoredLink> = document
        .select(&ANCHORS)
        .filter_map(|a| {
            let url = normalize_with(base_url, a.value().attr("href")?, keep_query)?;
            let text = format!(
                "{} {}",
                a.text().collect::<Vec<_>>().join(" "),
                a.value().attr("title").unwrap_or_default()
            );
            let score = if keywords.is_match(&url) || keywords.is_match(&text) {
                3
            } else {
                1
            };
            Some(ScoredLink { url, score })
        })
        .collect();
    links.sort_by(|a, b| b.score.cmp(&a.score));
    links
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://example.test/dir/page.html";

    #[test]
    fn absolute_urls_only_lose_their_fragment() {
        for u in [
            "https://example.test/a/b?x=1",
            "http://other.test:8080/path",
            "https://example.test/hoteles#lista",
        ] {
            let expected = u.split('#').next().unwrap();
            assert_eq!(normalize(BASE, u).as_deref(), Some(expected));
        }
    }

    #[test]
    fn rejects_non_navigational_schemes() {
        for href in ["mailto:info@example.test", "tel:+34 964 000 000", "javascript:void(0)", "ftp://x.test/f"] {
            assert_eq!(normalize(BASE, href), None, "{href}");
        }
    }

    #[test]
    fn resolves_relative_references() {
        assert_eq!(normalize(BASE, "../hotel?id=3#map").as_deref(), Some("https://example.test/hotel?id=3"));
        assert_eq!(
            normalize_with(BASE, "other.html?page=2", false).as_deref(),
            Some("https://example.test/dir/other.html")
        );
    }

    #[test]
    fn host_comparison_uses_netloc() {
        assert!(same_host("https://example.test/a", "http://example.test/b"));
        assert!(!same_host("https://example.test/a", "https://example.test:8443/a"));
        assert!(!same_host("https://example.test/a", "https://www.example.test/a"));
    }

    #[test]
    fn strips_tracking_parameters() {
        assert_eq!(
            strip_tracking("https://example.test/p?id=4&utm_source=x&fbclid=y#top", true),
            "https://example.test/p?id=4"
        );
        assert_eq!(strip_tracking("https://example.test/p?utm_medium=m", true), "https://example.test/p");
        assert_eq!(strip_tracking("https://example.test/p?id=4", false), "https://example.test/p");
    }

    #[test]
    fn keyword_links_come_first() {
        let keywords = Regex::new("(?i)hotel|playa").unwrap();
        let html = r#"<a href="/contacto">Contacto</a>
            <a href="/alojar" title="Hoteles">Dormir</a>
            <a href="mailto:x@y.test">mail</a>
            <a href="/playas#norte">Costa</a>"#;
        let links = extract_links(html, "https://example.test/", &keywords, true);
        let urls: Vec<&str> = links.iter().map(|l| l.url.as_str()).collect();
        assert_eq!(
            urls,
            ["https://example.test/alojar", "https://example.test/playas", "https://example.test/contacto"]
        );
    }
}
