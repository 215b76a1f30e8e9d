//! Release matching for reported download titles
//!
//! Download clients report every item filed under the tracked category,
//! including ones that were never grabbed through this tracker. The
//! [`ReleaseMatcher`] decides which titles belong to the catalog; adapters
//! skip unmatched titles during a poll.

use std::collections::HashSet;

/// Decides whether a reported title belongs to the tracked catalog
///
/// Implementations must be cheap: the matcher runs once per reported item
/// on every reconciliation pass.
///
/// # Examples
///
/// ```
/// use grabtrack::matcher::{AcceptAllMatcher, ReleaseMatcher};
///
/// let matcher = AcceptAllMatcher;
/// assert!(matcher.matches("Show.S01E01.720p-GRP"));
/// ```
pub trait ReleaseMatcher: Send + Sync {
    /// Whether the title belongs to the catalog
    fn matches(&self, title: &str) -> bool;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}

/// Matcher that accepts every title
///
/// The default when no catalog is wired up: every item in the tracked
/// category is treated as ours.
pub struct AcceptAllMatcher;

impl ReleaseMatcher for AcceptAllMatcher {
    fn matches(&self, _title: &str) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "accept_all"
    }
}

/// Matcher backed by a fixed set of known titles
///
/// Titles are compared after normalization, so `Show.S01E01` and
/// `show s01e01` refer to the same release.
pub struct ListMatcher {
    titles: HashSet<String>,
}

impl ListMatcher {
    /// Build a matcher from known titles
    pub fn new<I, S>(titles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            titles: titles
                .into_iter()
                .map(|t| normalize_title(t.as_ref()))
                .collect(),
        }
    }
}

impl ReleaseMatcher for ListMatcher {
    fn matches(&self, title: &str) -> bool {
        self.titles.contains(&normalize_title(title))
    }

    fn name(&self) -> &'static str {
        "list"
    }
}

/// Normalize a release title for comparison
///
/// Lowercases and folds the common word separators (dots, underscores)
/// into spaces. Scene naming is inconsistent about separators; sizes and
/// groups stay part of the key.
fn normalize_title(title: &str) -> String {
    title
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c == '.' || c == '_' { ' ' } else { c })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
