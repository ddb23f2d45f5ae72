//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the crawl loop that coordinates one run:
//! - Normalizing the seed and fixing the crawl scope
//! - Keeping a bounded number of page visits in flight
//! - De-duplicating discovered URLs through the run's visited set
//! - Stopping early on cancellation

use crate::config::Config;
use crate::crawler::report::CrawlReport;
use crate::crawler::visit::RunContext;
use crate::crawler::{build_http_client, PageFetcher};
use crate::extract::{ContentExtractor, HtmlExtractor};
use crate::robots::RobotsGate;
use crate::storage::GraphRepository;
use crate::url::normalize;
use crate::QuaeroError;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Visits between progress log lines
const PROGRESS_INTERVAL: u64 = 10;

/// A URL waiting to be visited, with its remaining depth budget
#[derive(Debug, Clone, PartialEq, Eq)]
struct WorkItem {
    url: String,
    remaining: u32,
}

/// Main crawler structure
///
/// One `Crawler` can run any number of crawls, sequentially or
/// concurrently; each call to `crawl` gets its own visited set and robots
/// cache.
pub struct Crawler {
    repo: Arc<dyn GraphRepository>,
    fetcher: PageFetcher,
    extractor: Arc<dyn ContentExtractor>,
    robots_token: String,
    max_workers: usize,
}

impl Crawler {
    /// Creates a crawler from configuration
    ///
    /// # Arguments
    ///
    /// * `config` - The crawler configuration
    /// * `repo` - Where the link graph is persisted
    ///
    /// # Returns
    ///
    /// * `Ok(Crawler)` - Successfully created crawler
    /// * `Err(QuaeroError)` - The HTTP client could not be built
    pub fn new(config: &Config, repo: Arc<dyn GraphRepository>) -> Result<Self, QuaeroError> {
        let client = build_http_client(&config.crawler, &config.user_agent)?;

        Ok(Self {
            repo,
            fetcher: PageFetcher::new(client),
            extractor: Arc::new(HtmlExtractor::new()),
            robots_token: config.user_agent.robots_token().to_string(),
            max_workers: config.crawler.max_workers.max(1) as usize,
        })
    }

    /// Replaces the default HTML extractor
    pub fn with_extractor(mut self, extractor: Arc<dyn ContentExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    /// The repository this crawler writes to
    pub fn repository(&self) -> &Arc<dyn GraphRepository> {
        &self.repo
    }

    /// Crawls outward from `seed`
    ///
    /// # Arguments
    ///
    /// * `seed` - Start URL; a missing scheme defaults to `http`
    /// * `depth` - Depth budget; 1 fetches the seed and records its links
    ///   without following them
    /// * `include_external` - Whether links to other hosts are followed
    /// * `cancel` - Checked before each new visit starts
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlReport)` - The run finished or was cancelled
    /// * `Err(QuaeroError)` - The seed is malformed or `depth` is zero
    pub async fn crawl(
        &self,
        seed: &str,
        depth: u32,
        include_external: bool,
        cancel: CancellationToken,
    ) -> Result<CrawlReport, QuaeroError> {
        if depth == 0 {
            return Err(QuaeroError::InvalidDepth(depth));
        }
        let seed = normalize(seed, None)?;
        let started = Instant::now();

        tracing::info!(
            "Starting crawl of {} (depth {}, external links {})",
            seed,
            depth,
            if include_external { "followed" } else { "recorded only" }
        );

        let context = Arc::new(RunContext {
            repo: Arc::clone(&self.repo),
            fetcher: self.fetcher.clone(),
            extractor: Arc::clone(&self.extractor),
            robots: RobotsGate::new(self.fetcher.client().clone(), self.robots_token.as_str()),
            scope_host: seed.host.clone(),
            include_external,
        });

        let mut report = CrawlReport::default();
        let mut visited: HashSet<String> = HashSet::new();
        let mut queue: VecDeque<WorkItem> = VecDeque::new();
        let mut in_flight = JoinSet::new();

        visited.insert(seed.page_key());
        queue.push_back(WorkItem {
            url: seed.absolute(),
            remaining: depth,
        });
        report.pages_enqueued += 1;

        loop {
            // Phase 1: top up in-flight visits
            while in_flight.len() < self.max_workers && !cancel.is_cancelled() {
                let Some(item) = queue.pop_front() else {
                    break;
                };
                let context = Arc::clone(&context);
                in_flight.spawn(async move { context.visit(item.url, item.remaining).await });
            }

            // Phase 2: reap one finished visit
            let Some(joined) = in_flight.join_next().await else {
                break;
            };
            let visit = match joined {
                Ok(visit) => visit,
                Err(e) => {
                    tracing::error!("Visit task failed: {}", e);
                    report.record_lost_visit();
                    continue;
                }
            };

            report.record(&visit);
            for child in visit.children {
                if visited.insert(child.page_key()) {
                    queue.push_back(WorkItem {
                        url: child.absolute(),
                        remaining: visit.remaining - 1,
                    });
                    report.pages_enqueued += 1;
                }
            }

            let done = report.pages_visited();
            if done > 0 && done % PROGRESS_INTERVAL == 0 {
                tracing::info!(
                    "Progress: {} visited, {} queued, {} in flight",
                    done,
                    queue.len(),
                    in_flight.len()
                );
            }
        }

        report.cancelled = cancel.is_cancelled() && !queue.is_empty();
        report.elapsed = started.elapsed();

        if report.cancelled {
            tracing::warn!(
                "Crawl of {} cancelled with {} URLs unvisited",
                seed,
                queue.len()
            );
        }
        tracing::info!(
            "Crawl of {} complete: {} fetched, {} extracted, {} links in {:.1}s",
            seed,
            report.pages_fetched,
            report.pages_extracted,
            report.links_recorded,
            report.elapsed.as_secs_f64()
        );

        Ok(report)
    }
}
