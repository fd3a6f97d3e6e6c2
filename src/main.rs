use anyhow::{Context, Result};
use clap::Parser;
use scoped_crawler::ui::run_dashboard;
use scoped_crawler::{
    AdmissibilityFilter, CrawlState, Crawler, CrawlerConfig, HtmlExtractor, HttpClient,
    NormalizedUrl, PageProcessor, Store, Summary,
};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "scoped-crawler",
    version,
    about = "Crawls a fixed set of domains and reports word and subdomain statistics"
)]
struct CommandLineArgs {
    /// JSON config file; defaults are used when it does not exist
    #[arg(long, default_value = "config.json")]
    config: PathBuf,

    /// Seed URL, repeatable. Replaces the configured seeds.
    #[arg(long = "seed")]
    seeds: Vec<String>,

    /// Ignore saved state and start from scratch
    #[arg(long)]
    restart: bool,

    #[arg(long)]
    max_pages: Option<usize>,

    #[arg(long)]
    workers: Option<usize>,

    /// RocksDB directory for the saved crawl state
    #[arg(long)]
    store: Option<PathBuf>,

    /// Show the live terminal dashboard; logs go to --log-file instead
    #[arg(long)]
    dashboard: bool,

    #[arg(long, default_value = "crawler.log")]
    log_file: PathBuf,

    /// Print the summary as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = CommandLineArgs::parse();
    init_tracing(args.dashboard.then_some(args.log_file.as_path()))?;

    let mut config = CrawlerConfig::load(&args.config)?;
    if !args.seeds.is_empty() {
        config.seeds = args.seeds.clone();
    }
    if let Some(workers) = args.workers {
        config.workers = workers;
    }
    if let Some(max_pages) = args.max_pages {
        config.max_pages = Some(max_pages);
    }
    if let Some(store) = &args.store {
        config.store_path = store.clone();
    }
    config.validate()?;

    let filter = Arc::new(AdmissibilityFilter::from_config(&config.filter)?);
    let state = Arc::new(CrawlState::new(config.subdomain_suffix.clone()));
    let processor = PageProcessor::new(state.clone(), filter, Arc::new(HtmlExtractor));

    let store = match Store::open(&config.store_path) {
        Ok(store) => Some(store),
        Err(e) => {
            warn!(path = %config.store_path.display(), error = %e, "failed to open store, crawling without persistence");
            None
        }
    };

    let mut queue = Vec::new();
    if let Some(store) = &store {
        if args.restart {
            info!("restart requested, saved state will be overwritten");
        } else {
            queue = resume(store, &state);
        }
    }

    let mut seeds_added = 0;
    for seed in &config.seeds {
        match NormalizedUrl::parse(seed) {
            Ok(url) => {
                if processor.observe_seed(&url) {
                    queue.push(url);
                    seeds_added += 1;
                }
            }
            Err(e) => warn!(seed = %seed, error = %e, "ignoring malformed seed"),
        }
    }
    info!(seeds_added, queued = queue.len(), "frontier ready");

    let http_client = HttpClient::new(&config.user_agent, config.request_timeout())
        .context("failed to build http client")?;
    let mut crawler = Crawler::new(processor, http_client, &config);
    if let Some(store) = store {
        crawler = crawler.with_store(store);
    }
    let stats = crawler.stats().clone();

    tokio::spawn({
        let stats = stats.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("received ctrl+c; finishing the current wave");
                stats.stop();
            }
        }
    });

    let ui_task = if args.dashboard {
        let stats = stats.clone();
        let state = state.clone();
        let max_pages = config.max_pages;
        Some(tokio::spawn(async move {
            if let Err(e) = run_dashboard(stats, state, max_pages).await {
                error!(error = %e, "dashboard failed");
            }
        }))
    } else {
        None
    };

    crawler.run(queue).await;

    if let Some(task) = ui_task {
        if let Err(e) = task.await {
            warn!(error = %e, "dashboard task did not shut down cleanly");
        }
    }

    let summary = Summary::from_state(&state, config.top_words);
    if args.json {
        println!("{}", summary.to_json()?);
    } else {
        print!("{summary}");
    }
    Ok(())
}

/// Merges the saved tables into `state` and returns the saved queue.
fn resume(store: &Store, state: &CrawlState) -> Vec<NormalizedUrl> {
    match store.load() {
        Ok(snapshot) => {
            info!(
                seen = snapshot.seen.len(),
                pages = snapshot.word_counts.len(),
                "loaded saved crawl state"
            );
            state.merge(snapshot);
        }
        Err(e) => {
            warn!(error = %e, "failed to load saved state, starting fresh");
            return Vec::new();
        }
    }

    match store.load_pending() {
        Ok(pending) => pending
            .iter()
            .filter_map(|url| match NormalizedUrl::parse(url) {
                Ok(url) => Some(url),
                Err(e) => {
                    warn!(url = %url, error = %e, "dropping malformed saved url");
                    None
                }
            })
            .collect(),
        Err(e) => {
            warn!(error = %e, "failed to load saved queue");
            Vec::new()
        }
    }
}

fn init_tracing(log_file: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match log_file {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("failed to create log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init(),
    }
    Ok(())
}
