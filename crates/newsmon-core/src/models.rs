use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

/// One ranked item from the story service.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Story {
    pub id: u64,
    pub title: String,
    /// Absent for text posts such as "Ask HN".
    pub url: Option<String>,
    pub score: i64,
    pub published_at: DateTime<Utc>,
}

impl Story {
    /// The link to open for this story, if it has one.
    pub fn open_target(&self) -> Option<&str> {
        self.url.as_deref().filter(|u| !u.trim().is_empty())
    }

    /// Menu-style label, e.g. `"Rust 2024 released (312)"`.
    pub fn label(&self) -> String {
        format!("{} ({})", self.title, self.score)
    }
}

/// The user's interest filter.
///
/// Both sets empty means "no filtering". Tokens keep the case they were
/// entered with; case is folded only when matching.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FilterSet {
    pub keywords: BTreeSet<String>,
    pub topics: BTreeSet<String>,
}

impl FilterSet {
    /// Build a filter set, trimming tokens and dropping blank ones.
    pub fn new<K, T>(keywords: K, topics: T) -> Self
    where
        K: IntoIterator,
        K::Item: Into<String>,
        T: IntoIterator,
        T::Item: Into<String>,
    {
        Self {
            keywords: normalize(keywords),
            topics: normalize(topics),
        }
    }

    /// Parse raw comma-separated user input for both categories.
    pub fn parse(keywords: &str, topics: &str) -> Self {
        Self {
            keywords: parse_tokens(keywords),
            topics: parse_tokens(topics),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty() && self.topics.is_empty()
    }

    /// Whether `story` passes this filter.
    ///
    /// Substring match on the lowercased title against every keyword and
    /// topic token. An empty category contributes no tokens.
    pub fn matches(&self, story: &Story) -> bool {
        if self.is_empty() {
            return true;
        }
        let title = story.title.to_lowercase();
        self.keywords
            .iter()
            .chain(self.topics.iter())
            .any(|token| title.contains(&token.to_lowercase()))
    }
}

/// Split comma-separated input into a token set.
///
/// `" AI, , python "` becomes `{"AI", "python"}`.
pub fn parse_tokens(raw: &str) -> BTreeSet<String> {
    normalize(raw.split(','))
}

fn normalize<I>(tokens: I) -> BTreeSet<String>
where
    I: IntoIterator,
    I::Item: Into<String>,
{
    tokens
        .into_iter()
        .map(Into::into)
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}
