use std::collections::HashMap;
use std::sync::Arc;

use fs_err as fs;
use futures::future::BoxFuture;
use futures::FutureExt;
use tempfile::TempDir;
use tws_crawler::{FetchConfig, Fetcher, RawResponse, Request, Scrapable, Transport};
use tws_extract::{glob_sources, run_batch, ExtractConfig, RecordLayout, Source, TourismScraper};

/// Fixed pages by URL, 404 for anything else
struct StaticSite(HashMap<String, String>);

impl Transport for StaticSite {
    fn get<'a>(&'a self, request: Request) -> BoxFuture<'a, anyhow::Result<RawResponse>> {
        let response = match self.0.get(&request.url) {
            Some(body) => RawResponse {
                status: 200,
                final_url: request.url,
                headers: vec![("Content-Type".into(), "text/html; charset=utf-8".into())],
                body: body.clone().into_bytes(),
            },
            None => RawResponse {
                status: 404,
                final_url: request.url,
                headers: Vec::new(),
                body: Vec::new(),
            },
        };
        async move { Ok(response) }.boxed()
    }
}

fn fetcher(pages: &[(&str, &str)]) -> Fetcher {
    let site = StaticSite(pages.iter().map(|(u, b)| (u.to_string(), b.to_string())).collect());
    let config = FetchConfig {
        min_delay_secs: 1.0,
        max_delay_secs: 1.0,
        retry_jitter_secs: 0.0,
        cache_dir: None,
        ..Default::default()
    };
    Fetcher::with_transport(config, Arc::new(site)).unwrap()
}

fn scraper(outdir: &std::path::Path) -> TourismScraper {
    let config = ExtractConfig {
        layout: RecordLayout::Nested,
        ..ExtractConfig::with_outdir(outdir)
    };
    TourismScraper::new(&config).unwrap()
}

const RESTAURANT: &str = r#"<script type="application/ld+json">
{"@type": "Restaurant", "name": "Casa Pepe", "telephone": "964 12 34 56"}</script>"#;

#[tokio::test(start_paused = true)]
async fn failures_do_not_stop_the_batch() {
    let out = TempDir::new().unwrap();
    let fetcher = fetcher(&[("https://a.test/restaurante", RESTAURANT)]);
    let mut scraper = scraper(out.path());

    let sources = vec![
        Source::Url("https://a.test/restaurante".into()),
        Source::Url("https://a.test/missing".into()),
        Source::parse("does/not/exist.html", None),
    ];
    let summary = run_batch(&fetcher, sources, 2, &mut scraper).await;
    scraper.finalizer().unwrap();

    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.failed.len(), 2);
    assert!(summary.has_failures());
    assert!(out.path().join("a.test_restaurante/record.json").exists());

    let report = scraper.report();
    assert_eq!(report.pages, 1);
    assert_eq!(report.failed, 2);
    assert_eq!(report.entities, 1);
    let log = fs::read_to_string(out.path().join("pages.csv")).unwrap();
    assert_eq!(log.lines().count(), 4);
    assert!(log.contains("https://a.test/missing"));
}

#[tokio::test]
async fn local_files_from_a_glob() {
    let input = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    fs::write(input.path().join("uno.html"), RESTAURANT).unwrap();
    fs::write(input.path().join("dos.html"), "<table><tr><th>A</th></tr><tr><td>x</td></tr></table>").unwrap();
    fs::write(input.path().join("notes.txt"), "skipped").unwrap();

    let pattern = format!("{}/*.html", input.path().display());
    let sources = glob_sources(&pattern, Some("https://b.test/")).unwrap();
    assert_eq!(sources.len(), 2);

    let mut scraper = scraper(out.path());
    let summary = run_batch(&fetcher(&[]), sources, 4, &mut scraper).await;
    assert_eq!(summary.succeeded, 2);
    assert!(out.path().join("https_b.test_uno/record.json").exists());
    assert!(out.path().join("https_b.test_dos/tables/https_b.test_dos_0.csv").exists());
}
