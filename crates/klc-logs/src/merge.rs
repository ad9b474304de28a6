use chrono::{DateTime, Utc};
use tracing::{debug, trace};

use crate::parser::LogParser;

/// Accumulates lines from several pods and sorts them into one timeline
#[derive(Debug, Default)]
pub struct LogMerger {
    /// Lines in accumulation order: pod order first, then in-stream order
    lines: Vec<String>,
}

impl LogMerger {
    /// Create an empty merger
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one pod's lines after everything accumulated so far
    pub fn extend<I>(&mut self, lines: I)
    where
        I: IntoIterator<Item = String>,
    {
        self.lines.extend(lines);
    }

    /// Number of accumulated lines
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Consume the merger, returning the lines in timestamp order
    pub fn into_sorted(self) -> Vec<String> {
        sort_by_timestamp(self.lines)
    }
}

/// Sort lines ascending by their leading timestamp.
///
/// Ordering is the total order `(key, accumulation index)`. A timestamped
/// line's key is its own timestamp. A line without a parseable timestamp is
/// keyed by the latest timestamp seen before it in accumulation order, or sorts
/// ahead of every timestamped line when none has been seen yet. Those keys never
/// decrease along the input, so unparseable lines keep their relative order.
pub fn sort_by_timestamp(lines: Vec<String>) -> Vec<String> {
    let mut latest: Option<DateTime<Utc>> = None;
    let mut unparsed = 0usize;

    let mut keyed: Vec<(Option<DateTime<Utc>>, usize, String)> = lines
        .into_iter()
        .enumerate()
        .map(|(index, line)| {
            let key = match LogParser::extract_timestamp(&line) {
                Ok(ts) => {
                    latest = latest.max(Some(ts));
                    Some(ts)
                }
                Err(e) => {
                    trace!("Line {} keeps its position: {}", index, e);
                    unparsed += 1;
                    latest
                }
            };
            (key, index, line)
        })
        .collect();

    if unparsed > 0 {
        debug!(
            "{} of {} lines had no parseable timestamp",
            unparsed,
            keyed.len()
        );
    }

    keyed.sort_unstable_by_key(|(key, index, _)| (*key, *index));
    keyed.into_iter().map(|(_, _, line)| line).collect()
}
