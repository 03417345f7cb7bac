//! Locating the changed file behind a changelog entry
//!
//! Every changed file of a two-ref comparison is scored against tokens taken
//! from the entry and the caller's query. Path shape dominates the score:
//! configuration files are strongly preferred and documentation is pushed
//! down, so a `.tf` change wins over a changelog that merely mentions the
//! entry. Token hits then separate configuration files from each other.

use crate::github::ChangedFile;
use crate::models::ReleaseEntry;

use super::changelog::slugify;

/// Weight table for [`score_candidate`]
pub mod weights {
    pub const CONFIG_FILE: i64 = 150;
    pub const MODULES_DIR: i64 = 20;
    pub const EXAMPLES_DIR: i64 = -60;
    pub const DOCUMENTATION: i64 = -180;
    pub const TEST_PATH: i64 = -40;
    pub const FILENAME_TOKEN: i64 = 35;
    pub const CONTENT_TOKEN: i64 = 20;
    pub const FALLBACK_TOKEN: i64 = 10;
    /// Patch bytes per bonus point
    pub const PATCH_BYTES_PER_POINT: usize = 400;
}

/// Default number of diff lines shown for a located patch
pub const DEFAULT_MAX_LINES: usize = 24;

/// Lowercased tokens searched for in candidate paths and patches
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Targets {
    pub filename_tokens: Vec<String>,
    pub content_tokens: Vec<String>,
    /// Whole query (or entry title) searched in patch bodies only
    pub fallback: Option<String>,
}

/// Outcome of [`locate_patch`]
#[derive(Debug, Clone, PartialEq)]
pub enum PatchMatch {
    Found {
        filename: String,
        patch: String,
        score: i64,
    },
    /// No changed file carried a patch
    NoCandidate,
}

/// Split on `-`, `_`, `.`, `:` and whitespace, dropping empty parts
pub fn tokenize_identifier(value: &str) -> Vec<String> {
    value
        .split(|c: char| matches!(c, '-' | '_' | '.' | ':') || c.is_whitespace())
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

fn push_unique(tokens: &mut Vec<String>, token: &str) {
    let token = token.trim();
    if !token.is_empty() && !tokens.iter().any(|t| t == token) {
        tokens.push(token.to_string());
    }
}

/// Build search tokens from an entry and an optional caller query
pub fn targets(entry: &ReleaseEntry, query: &str) -> Targets {
    let mut out = Targets::default();

    if let Some(identifier) = &entry.identifier {
        let id = identifier.to_lowercase();
        push_unique(&mut out.filename_tokens, &id);
        push_unique(&mut out.content_tokens, &id);
        for part in tokenize_identifier(&id) {
            push_unique(&mut out.filename_tokens, &part);
            push_unique(&mut out.content_tokens, &part);
        }
    }

    let query = query.trim();
    if !query.is_empty() {
        let lowered = query.to_lowercase();
        for token in tokenize_identifier(&lowered) {
            push_unique(&mut out.filename_tokens, &token);
            push_unique(&mut out.content_tokens, &token);
        }
        out.fallback = Some(lowered);
    } else if !entry.title.trim().is_empty() {
        out.fallback = Some(entry.title.to_lowercase());
    }

    out
}

/// Relevance of one changed file; higher is better
pub fn score_candidate(filename: &str, patch: &str, targets: &Targets) -> i64 {
    // Leading slash so directory checks also match at the repository root
    let path = format!("/{}", filename.replace('\\', "/").to_lowercase());
    let body = patch.to_lowercase();
    let mut score = 0;

    if path.ends_with(".tf") {
        score += weights::CONFIG_FILE;
    }
    if path.contains("/modules/") {
        score += weights::MODULES_DIR;
    }
    if path.contains("/examples/") {
        score += weights::EXAMPLES_DIR;
    }
    if path.ends_with(".md") || path.contains("changelog") {
        score += weights::DOCUMENTATION;
    }
    if path.contains("/test") {
        score += weights::TEST_PATH;
    }

    for token in &targets.filename_tokens {
        if path.contains(token.as_str()) {
            score += weights::FILENAME_TOKEN;
        }
    }
    for token in &targets.content_tokens {
        if body.contains(token.as_str()) {
            score += weights::CONTENT_TOKEN;
        }
    }
    if let Some(fallback) = targets.fallback.as_deref().filter(|f| !f.is_empty()) {
        if body.contains(fallback) {
            score += weights::FALLBACK_TOKEN;
        }
    }

    score + (patch.len() / weights::PATCH_BYTES_PER_POINT) as i64
}

/// Pick the best scoring file with a non-empty patch; the first one wins ties
pub fn locate_patch(files: &[ChangedFile], entry: &ReleaseEntry, query: &str) -> PatchMatch {
    let targets = targets(entry, query);
    let mut best = PatchMatch::NoCandidate;
    let mut best_score = i64::MIN;

    for file in files {
        let Some(patch) = file.patch.as_deref().filter(|p| !p.is_empty()) else {
            continue;
        };
        let score = score_candidate(&file.filename, patch, &targets);
        if score > best_score {
            best_score = score;
            best = PatchMatch::Found {
                filename: file.filename.clone(),
                patch: patch.to_string(),
                score,
            };
        }
    }

    best
}

/// Keep at most `max_lines` lines. Returns the text and whether anything was cut.
/// A zero limit keeps everything.
pub fn trim_patch_lines(patch: &str, max_lines: usize) -> (String, bool) {
    if max_lines == 0 {
        return (patch.to_string(), false);
    }
    let lines: Vec<&str> = patch.split('\n').collect();
    if lines.len() <= max_lines {
        return (patch.to_string(), false);
    }
    (lines[..max_lines].join("\n"), true)
}

/// Find the entry a caller means.
///
/// Tried in order: identifier equal to the query (case-insensitive or after
/// slugging), `fallback` inside a title, the query inside a title.
pub fn select_release_entry<'a>(
    entries: &'a [ReleaseEntry],
    query: &str,
    fallback: Option<&str>,
) -> Option<&'a ReleaseEntry> {
    let normalized = query.trim().to_lowercase();
    if normalized.is_empty() {
        return None;
    }
    let slugged = slugify(&normalized);

    let by_identifier = entries.iter().find(|entry| {
        entry.identifier.as_deref().is_some_and(|id| {
            id.eq_ignore_ascii_case(&normalized) || slugify(id) == slugged
        })
    });
    if by_identifier.is_some() {
        return by_identifier;
    }

    if let Some(fallback) = fallback.map(str::trim).filter(|f| !f.is_empty()) {
        let fallback = fallback.to_lowercase();
        if let Some(entry) = entries
            .iter()
            .find(|e| e.title.to_lowercase().contains(&fallback))
        {
            return Some(entry);
        }
    }

    entries
        .iter()
        .find(|e| e.title.to_lowercase().contains(&normalized))
}
