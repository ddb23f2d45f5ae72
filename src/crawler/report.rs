//! Crawl run report
//!
//! Counters accumulated by the coordinator as visits complete.

use crate::crawler::visit::{FailReason, SkipReason, VisitOutcome, VisitReport};
use std::collections::BTreeMap;
use std::time::Duration;

/// Summary of one `Crawler::crawl` call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlReport {
    /// Visits that received an HTTP response
    pub pages_fetched: u64,
    /// Visits whose HTML response was extracted
    pub pages_extracted: u64,
    /// Links stored by extracted pages
    pub links_recorded: u64,
    /// Work items queued, seed included
    pub pages_enqueued: u64,
    /// Sites whose robots.txt refresh failed at the network level
    pub robots_failures: u64,
    pub skipped: BTreeMap<SkipReason, u64>,
    pub failed: BTreeMap<FailReason, u64>,
    /// True if cancellation left queued work unvisited
    pub cancelled: bool,
    pub elapsed: Duration,
}

impl CrawlReport {
    /// Folds one finished visit into the counters
    pub fn record(&mut self, visit: &VisitReport) {
        match visit.outcome {
            VisitOutcome::Extracted => {
                self.pages_fetched += 1;
                self.pages_extracted += 1;
            }
            VisitOutcome::Fetched => self.pages_fetched += 1,
            VisitOutcome::Skipped(reason) => *self.skipped.entry(reason).or_default() += 1,
            VisitOutcome::Failed(reason) => *self.failed.entry(reason).or_default() += 1,
        }
        self.links_recorded += visit.links_recorded as u64;
        if visit.robots_failed {
            self.robots_failures += 1;
        }
    }

    /// Counts a visit whose task died before reporting
    pub fn record_lost_visit(&mut self) {
        *self.failed.entry(FailReason::Panic).or_default() += 1;
    }

    /// Total visits that ended without a response
    pub fn total_skipped(&self) -> u64 {
        self.skipped.values().sum()
    }

    pub fn total_failed(&self) -> u64 {
        self.failed.values().sum()
    }

    /// Every visit the run completed
    pub fn pages_visited(&self) -> u64 {
        self.pages_fetched + self.total_skipped() + self.total_failed()
    }
}
