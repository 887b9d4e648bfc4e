use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{CommandFactory, Parser};
use clap_complete::{generate, Shell};
use fs_err::File;
use log::LevelFilter;
use tokio::runtime;
use tws_crawler::{Crawler, CrawlerConfig, FetchConfig, Fetcher, OnError, Scrapable};
use tws_extract::{
    glob_sources, read_source_list, run_batch, ExportReport, ExtractConfig, RecordLayout, Source,
    TourismScraper, DEFAULT_WORKERS,
};

/// Tourism Web Scraper
#[derive(Debug, Parser)]
#[command(version)]
pub struct Args {
    #[command(subcommand)]
    pub cmd: SubCommand,
    /// Log level of the tws crates, RUST_LOG takes precedence
    #[arg(long, global = true, default_value = "info")]
    pub log_level: LevelFilter,
    /// When quiet no logs are outputted
    #[arg(long, short, global = true)]
    pub quiet: bool,
}

#[derive(Debug, clap::Subcommand)]
pub enum SubCommand {
    Crawl(CrawlArgs),
    Extract(ExtractArgs),
    #[command(hide = true)]
    Completion {
        #[arg(value_enum, default_value = "bash")]
        shell: Shell,
    },
}

/// Settings shared by every command that downloads pages
#[derive(Debug, clap::Args)]
pub struct FetchArgs {
    /// Optional crawler yaml configuration file
    #[arg(env = "TWS_CRAWLER_CONFIG", long)]
    pub crawler_config: Option<PathBuf>,
    /// Override the user agent
    #[arg(long)]
    pub user_agent: Option<String>,
    /// Override the minimum delay between two requests to the same host
    #[arg(long)]
    pub min_delay: Option<f32>,
    /// Override the maximum delay between two requests to the same host
    #[arg(long)]
    pub max_delay: Option<f32>,
    /// Override the number of retries of a failing request
    #[arg(long)]
    pub max_retries: Option<u32>,
    /// Override the response cache directory
    #[arg(long)]
    pub cache_dir: Option<PathBuf>,
    /// Disable the response cache
    #[arg(long, conflicts_with = "cache_dir")]
    pub no_cache: bool,
    /// Ignore robots.txt rules and crawl delays
    #[arg(long)]
    pub ignore_robots: bool,
}

impl FetchArgs {
    fn load(&self) -> anyhow::Result<CrawlerConfig> {
        match &self.crawler_config {
            Some(path) => Ok(serde_yaml::from_reader(File::open(path)?)?),
            None => Ok(CrawlerConfig::default()),
        }
    }

    fn apply(&self, conf: &mut FetchConfig) {
        if let Some(user_agent) = &self.user_agent {
            conf.user_agent = user_agent.to_string();
        }
        if let Some(min_delay) = self.min_delay {
            conf.min_delay_secs = min_delay;
        }
        if let Some(max_delay) = self.max_delay {
            conf.max_delay_secs = max_delay;
        }
        if let Some(max_retries) = self.max_retries {
            conf.max_retries = max_retries;
        }
        if let Some(cache_dir) = &self.cache_dir {
            conf.cache_dir = Some(cache_dir.clone());
        }
        if self.no_cache {
            conf.cache_dir = None;
        }
        if self.ignore_robots {
            conf.respect_robots = false;
        }
    }
}

/// Crawl a site from seed URLs and extract tourism entities
#[derive(Debug, clap::Args)]
pub struct CrawlArgs {
    /// Seed URLs
    #[arg(required = true)]
    pub seeds: Vec<String>,
    /// Output directory
    #[arg(long, short, default_value = "out")]
    pub outdir: PathBuf,
    /// Override the maximum number of pages crawled
    #[arg(long)]
    pub max_pages: Option<usize>,
    /// Follow links to any host
    #[arg(long)]
    pub any_domain: bool,
    /// Only crawl URLs matching this regex
    #[arg(long)]
    pub allow: Option<String>,
    /// Override the regex of URLs never crawled
    #[arg(long)]
    pub deny: Option<String>,
    /// Seed the frontier from the sites' sitemaps
    #[arg(long)]
    pub sitemap_first: bool,
    /// Drop query strings of discovered links
    #[arg(long)]
    pub drop_query: bool,
    /// Override the download error handling strategy
    #[arg(value_enum, long)]
    pub on_dl_error: Option<OnError>,
    /// Override the scrap error handling strategy
    #[arg(value_enum, long)]
    pub on_scrap_error: Option<OnError>,
    #[command(flatten)]
    pub fetch: FetchArgs,
}

impl TryFrom<&CrawlArgs> for CrawlerConfig {
    type Error = anyhow::Error;

    fn try_from(args: &CrawlArgs) -> Result<Self, Self::Error> {
        let mut conf = args.fetch.load()?;
        args.fetch.apply(&mut conf.fetch);
        if let Some(max_pages) = args.max_pages {
            conf.max_pages = max_pages;
        }
        if args.any_domain {
            conf.same_domain = false;
        }
        if let Some(allow) = &args.allow {
            conf.allow = Some(allow.clone());
        }
        if let Some(deny) = &args.deny {
            conf.deny = Some(deny.clone()).filter(|d| !d.is_empty());
        }
        if args.sitemap_first {
            conf.sitemap_first = true;
        }
        if args.drop_query {
            conf.allow_query = false;
        }
        if let Some(on_dl_error) = args.on_dl_error {
            conf.on_dl_error = on_dl_error;
        }
        if let Some(on_scrap_error) = args.on_scrap_error {
            conf.on_scrap_error = on_scrap_error;
        }
        Ok(conf)
    }
}

fn print_report(report: &ExportReport) {
    println!("Unique entities: {}", report.entities);
    println!("Tables: {}", report.tables);
    for file in &report.files {
        println!("Saved: {}", file.display());
    }
}

pub fn crawl(args: CrawlArgs) -> anyhow::Result<ExitCode> {
    let crawler_conf = CrawlerConfig::try_from(&args)?;
    let extract_conf = ExtractConfig {
        layout: RecordLayout::Flat,
        ..ExtractConfig::with_outdir(&args.outdir)
    };

    let rt = runtime::Builder::new_multi_thread().enable_all().build()?;
    let summary = rt.block_on(async {
        let crawler = Crawler::new(crawler_conf)?;
        let mut scraper = TourismScraper::new(&extract_conf)?;
        let res = crawler.crawl(&args.seeds, &mut scraper).await;
        scraper.finalizer()?;
        res.map(|summary| (summary, scraper))
    });
    let (summary, scraper) = summary?;

    println!("Pages crawled: {}", summary.pages_crawled);
    println!("Failed pages: {}", summary.failed.len());
    print_report(scraper.report());
    Ok(ExitCode::SUCCESS)
}

/// Extract independent pages: URLs, local HTML files, list files or globs
#[derive(Debug, clap::Args)]
pub struct ExtractArgs {
    /// URLs or local HTML files
    pub sources: Vec<String>,
    /// File listing one `source[,base_url]` per line
    #[arg(long)]
    pub list: Option<PathBuf>,
    /// Glob of local HTML files
    #[arg(long)]
    pub glob: Option<String>,
    /// Base URL of local files
    #[arg(long)]
    pub base_url: Option<String>,
    /// Pages processed at once
    #[arg(long, short, default_value_t = DEFAULT_WORKERS)]
    pub workers: usize,
    /// Output directory
    #[arg(long, short, default_value = "out")]
    pub outdir: PathBuf,
    #[command(flatten)]
    pub fetch: FetchArgs,
}

impl ExtractArgs {
    fn sources(&self) -> anyhow::Result<Vec<Source>> {
        let base_url = self.base_url.as_deref();
        let mut sources: Vec<Source> = self.sources.iter().map(|s| Source::parse(s, base_url)).collect();
        if let Some(list) = &self.list {
            sources.extend(read_source_list(list)?);
        }
        if let Some(pattern) = &self.glob {
            sources.extend(glob_sources(pattern, base_url)?);
        }
        if sources.is_empty() {
            anyhow::bail!("Nothing to extract, give sources, --list or --glob");
        }
        Ok(sources)
    }
}

pub fn extract(args: ExtractArgs) -> anyhow::Result<ExitCode> {
    let sources = args.sources()?;
    let mut fetch_conf = args.fetch.load()?.fetch;
    args.fetch.apply(&mut fetch_conf);
    let extract_conf = ExtractConfig {
        layout: RecordLayout::Nested,
        ..ExtractConfig::with_outdir(&args.outdir)
    };

    let rt = runtime::Builder::new_multi_thread().enable_all().build()?;
    let (summary, scraper) = rt.block_on(async {
        let fetcher = Fetcher::new(fetch_conf)?;
        let mut scraper = TourismScraper::new(&extract_conf)?;
        let summary = run_batch(&fetcher, sources, args.workers, &mut scraper).await;
        scraper.finalizer()?;
        Ok::<_, anyhow::Error>((summary, scraper))
    })?;

    println!("Processed: {}", summary.succeeded);
    println!("Failed: {}", summary.failed.len());
    for (source, reason) in &summary.failed {
        println!("  {source}: {reason}");
    }
    print_report(scraper.report());

    if summary.has_failures() {
        Ok(ExitCode::from(2))
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

fn init_logger(level: LevelFilter) {
    let filter = format!("tws_crawler={level},tws_extract={level},tws={level}");
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();
}

fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();
    if !args.quiet {
        init_logger(args.log_level);
    }

    match args.cmd {
        SubCommand::Crawl(args) => crawl(args),
        SubCommand::Extract(args) => extract(args),
        SubCommand::Completion { shell } => {
            generate(shell, &mut Args::command(), "tws", &mut io::stdout());
            Ok(ExitCode::SUCCESS)
        }
    }
}
