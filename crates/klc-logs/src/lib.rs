//! Log processing for kube-log-collector
//!
//! This crate provides query filtering, timestamp parsing, the time-ordered
//! merge of several pods' logs, and persistence of the results.

mod collector;
mod filter;
mod merge;
mod parser;
mod writer;

pub use collector::{CollectionReport, Collector, FilteredReport};
pub use filter::QueryFilter;
pub use merge::{LogMerger, sort_by_timestamp};
pub use parser::{LogParser, TimestampParseError};
pub use writer::{COMBINED_FILE_NAME, OutputWriter, validate_pod_name};
