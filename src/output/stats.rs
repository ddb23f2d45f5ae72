//! Statistics generation from the graph repository
//!
//! This module provides functionality for extracting and displaying
//! graph statistics and crawl run reports.

use crate::crawler::CrawlReport;
use crate::state::PageState;
use crate::storage::GraphRepository;
use crate::QuaeroError;
use std::collections::BTreeMap;

/// Graph statistics summary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphStatistics {
    /// Number of distinct hosts
    pub sites: u64,

    /// Total number of pages known
    pub pages: u64,

    /// Total number of links stored
    pub links: u64,

    /// Count of pages by state, empty states omitted
    pub pages_by_state: BTreeMap<PageState, u64>,
}

/// Loads statistics from a repository
///
/// # Arguments
///
/// * `repo` - The repository to query
///
/// # Returns
///
/// * `Ok(GraphStatistics)` - Successfully loaded statistics
/// * `Err(QuaeroError)` - Failed to query statistics
pub fn load_statistics(repo: &dyn GraphRepository) -> Result<GraphStatistics, QuaeroError> {
    let mut pages_by_state = BTreeMap::new();
    for state in PageState::all_states() {
        let count = repo.count_pages_by_state(state)?;
        if count > 0 {
            pages_by_state.insert(state, count);
        }
    }

    Ok(GraphStatistics {
        sites: repo.count_sites()?,
        pages: repo.count_pages()?,
        links: repo.count_links()?,
        pages_by_state,
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &GraphStatistics) {
    println!("=== Graph Statistics ===\n");

    println!("Overview:");
    println!("  Sites: {}", stats.sites);
    println!("  Pages: {}", stats.pages);
    println!("  Links: {}", stats.links);
    println!();

    println!("Pages by State:");
    // Sort states by count (descending)
    let mut state_counts: Vec<_> = stats.pages_by_state.iter().collect();
    state_counts.sort_by(|a, b| b.1.cmp(a.1));

    for (state, count) in state_counts {
        println!("  {}: {} ({:.1}%)", state, count, percentage(*count, stats.pages));
    }
}

/// Prints a finished run's report to stdout
pub fn print_report(report: &CrawlReport) {
    println!("=== Crawl Report ===\n");

    if report.cancelled {
        println!("Run cancelled before the queue drained.\n");
    }

    println!("Overview:");
    println!("  Pages enqueued: {}", report.pages_enqueued);
    println!("  Pages fetched: {}", report.pages_fetched);
    println!("  Pages extracted: {}", report.pages_extracted);
    println!("  Links recorded: {}", report.links_recorded);
    println!("  Elapsed: {:.1}s", report.elapsed.as_secs_f64());
    println!();

    if !report.skipped.is_empty() {
        println!("Skipped ({}):", report.total_skipped());
        for (reason, count) in &report.skipped {
            println!("  {}: {}", reason, count);
        }
        println!();
    }

    if !report.failed.is_empty() {
        println!("Failed ({}):", report.total_failed());
        for (reason, count) in &report.failed {
            println!("  {}: {}", reason, count);
        }
        println!();
    }

    if report.robots_failures > 0 {
        println!(
            "robots.txt unavailable for {} site(s); cached policy used",
            report.robots_failures
        );
    }
}

fn percentage(part: u64, total: u64) -> f64 {
    if total > 0 {
        (part as f64 / total as f64) * 100.0
    } else {
        0.0
    }
}
