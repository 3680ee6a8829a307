//! Heuristic detection of git-related queries.
//!
//! A query is treated as a git query when any word of the git vocabulary
//! fuzzily matches part of it, or when it says it wants to do something
//! "with git". Mentions of git that only live inside a URL, and queries that
//! are really about downloading something with `curl`/`wget`, are excluded.

use regex::Regex;
use std::sync::LazyLock;

/// Minimum partial similarity (0-100) for a vocabulary term to count as present.
pub const DEFAULT_FUZZY_THRESHOLD: u8 = 85;

pub const GIT_TERMS: [&str; 10] = [
    "git", "commit", "branch", "merge", "pull", "push", "rebase", "stash", "checkout", "clone",
];

const DOWNLOAD_TOOLS: [&str; 2] = ["curl", "wget"];

static USE_GIT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(use|using|with|in) git\b").expect("static regex is valid")
});

// scheme://..., www...., scp-style user@host:path, host.tld/path and bare
// hosts under a common TLD (github.com)
static URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?:[a-z][a-z0-9+.-]*://|www\.)\S+",
        r"|[\w.-]+@[\w.-]+:\S+",
        r"|\b[\w-]+(?:\.[\w-]+)+/\S*",
        r"|\b[\w-]+(?:\.[\w-]+)*\.(?:com|org|net|io|dev|edu|gov|app|ai|info|xyz|co)\b",
    ))
    .expect("static regex is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Classification {
    pub is_git: bool,
    /// Only ever true together with `is_git`.
    pub is_commit_message: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct QueryClassifier {
    threshold: u8,
}

impl Default for QueryClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_FUZZY_THRESHOLD)
    }
}

impl QueryClassifier {
    pub fn new(threshold: u8) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> u8 {
        self.threshold
    }

    pub fn classify(&self, query: &str) -> Classification {
        let query = query.to_lowercase();

        if DOWNLOAD_TOOLS.iter().any(|tool| query.contains(tool)) {
            return Classification::default();
        }

        let without_urls = URL.replace_all(&query, " ");
        let is_git = GIT_TERMS
            .iter()
            .any(|term| partial_ratio(term, &without_urls) >= self.threshold)
            || USE_GIT.is_match(&without_urls);

        Classification {
            is_git,
            is_commit_message: is_git
                && without_urls.contains("commit")
                && without_urls.contains("message"),
        }
    }
}

/// Best similarity (0-100) between the shorter string and any window of the
/// longer one of the same length.
pub fn partial_ratio(a: &str, b: &str) -> u8 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let (short, long) = if a.len() <= b.len() { (&a, &b) } else { (&b, &a) };

    if short.is_empty() {
        return if long.is_empty() { 100 } else { 0 };
    }

    long.windows(short.len())
        .map(|window| ratio(short, window))
        .max()
        .unwrap_or(0)
}

/// Indel similarity: `2 * lcs / (len_a + len_b)`, scaled to 0-100.
fn ratio(a: &[char], b: &[char]) -> u8 {
    let total = a.len() + b.len();
    if total == 0 {
        return 100;
    }
    let lcs = longest_common_subsequence(a, b);
    ((200 * lcs) as f64 / total as f64).round() as u8
}

fn longest_common_subsequence(a: &[char], b: &[char]) -> usize {
    let mut previous = vec![0usize; b.len() + 1];
    let mut current = vec![0usize; b.len() + 1];

    for ca in a {
        for (j, cb) in b.iter().enumerate() {
            current[j + 1] = if ca == cb {
                previous[j] + 1
            } else {
                previous[j + 1].max(current[j])
            };
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[b.len()]
}
