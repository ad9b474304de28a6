/// Substring filter for log lines (case-sensitive, exact)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueryFilter {
    token: String,
}

impl QueryFilter {
    /// Create a filter for `token`; an empty or absent token means "no query"
    pub fn new(token: Option<&str>) -> Option<Self> {
        token.filter(|t| !t.is_empty()).map(|t| Self {
            token: t.to_string(),
        })
    }

    /// Check if a line contains the token
    pub fn matches(&self, line: &str) -> bool {
        line.contains(&self.token)
    }

    /// Get the original token
    pub fn token(&self) -> &str {
        &self.token
    }
}
