use chrono::{DateTime, Utc};
use thiserror::Error;

/// Why a log line carries no usable leading timestamp
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TimestampParseError {
    #[error("log line has no leading token")]
    Empty,

    #[error("'{token}' is not an RFC 3339 timestamp: {source}")]
    Invalid {
        token: String,
        #[source]
        source: chrono::ParseError,
    },
}

/// Extracts structure from raw log lines
pub struct LogParser;

impl LogParser {
    /// Parse the first whitespace-delimited token of a line as an RFC 3339 timestamp.
    ///
    /// Accepts what the API server emits with `timestamps=true`
    /// (`2024-01-15T10:30:00.123456789Z`) as well as second precision and
    /// numeric offsets; the result is normalised to UTC.
    pub fn extract_timestamp(line: &str) -> Result<DateTime<Utc>, TimestampParseError> {
        let token = line
            .split_whitespace()
            .next()
            .ok_or(TimestampParseError::Empty)?;

        DateTime::parse_from_rfc3339(token)
            .map(|ts| ts.with_timezone(&Utc))
            .map_err(|source| TimestampParseError::Invalid {
                token: token.to_string(),
                source,
            })
    }
}
