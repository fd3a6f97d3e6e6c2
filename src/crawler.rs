use crate::config::CrawlerConfig;
use crate::http_client::Fetcher;
use crate::normalizer::NormalizedUrl;
use crate::processor::{PageOutcome, PageProcessor};
use crate::rate_limiter::RateLimiter;
use crate::store::Store;
use crate::ui::CrawlStats;
use futures::StreamExt;
use futures::stream;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use tracing::{info, warn};

/// Totals for one call to [`Crawler::run`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlOutcome {
    pub fetched: usize,
    pub processed: usize,
    pub skipped: usize,
    /// URLs still queued when the crawl ended.
    pub pending: usize,
    pub stopped: bool,
}

/// Drives the crawl in waves of at most `workers` concurrent fetches.
///
/// Pages are folded into the shared state while a wave is in flight; between
/// waves nothing mutates the state, which is where checkpoints are written.
pub struct Crawler<F> {
    processor: PageProcessor,
    fetcher: F,
    rate_limiter: RateLimiter,
    store: Option<Store>,
    stats: Arc<CrawlStats>,
    workers: usize,
    max_pages: Option<usize>,
    checkpoint_interval: usize,
}

impl<F: Fetcher> Crawler<F> {
    pub fn new(processor: PageProcessor, fetcher: F, config: &CrawlerConfig) -> Self {
        Self {
            processor,
            fetcher,
            rate_limiter: RateLimiter::new(config.politeness_delay()),
            store: None,
            stats: Arc::new(CrawlStats::new()),
            workers: config.workers.max(1),
            max_pages: config.max_pages,
            checkpoint_interval: config.checkpoint_interval,
        }
    }

    pub fn with_store(mut self, store: Store) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_stats(mut self, stats: Arc<CrawlStats>) -> Self {
        self.stats = stats;
        self
    }

    pub fn stats(&self) -> &Arc<CrawlStats> {
        &self.stats
    }

    pub async fn run(&self, initial: Vec<NormalizedUrl>) -> CrawlOutcome {
        let mut queue: VecDeque<NormalizedUrl> = initial.into();
        let mut outcome = CrawlOutcome::default();
        let mut since_checkpoint = 0usize;

        info!(queued = queue.len(), workers = self.workers, "crawl started");

        loop {
            if self.stats.should_stop() {
                info!("stop requested");
                outcome.stopped = true;
                break;
            }
            let budget = match self.max_pages {
                Some(max) => max.saturating_sub(outcome.fetched),
                None => usize::MAX,
            };
            if budget == 0 {
                info!(fetched = outcome.fetched, "page limit reached");
                break;
            }
            let take = self.workers.min(budget).min(queue.len());
            if take == 0 {
                break;
            }

            let wave: Vec<NormalizedUrl> = queue.drain(..take).collect();
            self.stats.queue_size.store(queue.len(), Ordering::Relaxed);
            let discovered = self.run_wave(wave, &mut outcome).await;
            queue.extend(discovered);
            self.stats.queue_size.store(queue.len(), Ordering::Relaxed);

            since_checkpoint += take;
            if self.checkpoint_interval > 0 && since_checkpoint >= self.checkpoint_interval {
                self.checkpoint(&queue);
                since_checkpoint = 0;
            }
        }

        self.checkpoint(&queue);
        outcome.pending = queue.len();
        self.stats.finish();

        info!(
            fetched = outcome.fetched,
            processed = outcome.processed,
            skipped = outcome.skipped,
            pending = outcome.pending,
            unique_links = self.processor.state().unique_links(),
            "crawl finished"
        );
        outcome
    }

    async fn run_wave(
        &self,
        wave: Vec<NormalizedUrl>,
        outcome: &mut CrawlOutcome,
    ) -> Vec<NormalizedUrl> {
        let discovered = Mutex::new(Vec::new());
        let totals = Mutex::new((0usize, 0usize));
        let fetched = wave.len();

        stream::iter(wave)
            .for_each_concurrent(self.workers, |url| {
                let discovered = &discovered;
                let totals = &totals;
                async move {
                    self.stats.active_workers.fetch_add(1, Ordering::Relaxed);
                    self.rate_limiter.wait_if_needed(url.as_str()).await;
                    let fetch = self.fetcher.fetch(url.as_str()).await;
                    self.stats.pages_fetched.fetch_add(1, Ordering::Relaxed);

                    match self.processor.process_page(&url, &fetch) {
                        PageOutcome::Processed { candidates, .. } => {
                            self.stats.pages_processed.fetch_add(1, Ordering::Relaxed);
                            totals.lock().0 += 1;
                            discovered.lock().extend(candidates);
                        }
                        PageOutcome::Skipped(reason) => {
                            self.stats.pages_skipped.fetch_add(1, Ordering::Relaxed);
                            self.stats.add_error(format!("{url}: {reason}"));
                            totals.lock().1 += 1;
                        }
                    }
                    self.stats.active_workers.fetch_sub(1, Ordering::Relaxed);
                }
            })
            .await;

        let (processed, skipped) = totals.into_inner();
        outcome.fetched += fetched;
        outcome.processed += processed;
        outcome.skipped += skipped;
        discovered.into_inner()
    }

    fn checkpoint(&self, queue: &VecDeque<NormalizedUrl>) {
        let Some(store) = &self.store else {
            return;
        };
        let snapshot = self.processor.state().snapshot();
        let pending: Vec<String> = queue.iter().map(|url| url.as_str().to_string()).collect();
        match store.save(&snapshot, &pending) {
            Ok(()) => info!(
                seen = snapshot.seen.len(),
                pending = pending.len(),
                "checkpoint saved"
            ),
            Err(e) => {
                warn!(error = %e, "checkpoint failed, continuing");
                self.stats.add_error(format!("checkpoint failed: {e}"));
            }
        }
    }
}
