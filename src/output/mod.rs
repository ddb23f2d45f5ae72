//! Output module for reporting on crawls and the stored graph
//!
//! This module handles:
//! - Printing the report of a finished crawl run
//! - Loading and printing graph statistics

pub mod stats;

pub use stats::{load_statistics, print_report, print_statistics, GraphStatistics};
