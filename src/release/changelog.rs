//! Changelog markdown parsing
//!
//! Understands the `## <version> (<date>)` layout written by release tooling,
//! including the bracketed and linked forms:
//!
//! ```text
//! ## [1.4.0](https://github.com/org/repo/compare/v1.3.0...v1.4.0) (2024-05-01)
//!
//! ### Features
//!
//! * add private endpoint support
//! ```

use crate::error::Result;
use crate::models::ReleaseEntry;
use regex::Regex;

/// Section used for bullets that appear before any `###` heading
pub const DEFAULT_SECTION: &str = "Other";

/// A release heading found in a changelog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangelogRelease {
    /// Version without a leading `v`
    pub version: String,
    pub date: Option<String>,
    /// Link attached to a `[version](link)` heading
    pub link: Option<String>,
}

/// The text of one release section
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseBlock {
    pub body: String,
    pub date: Option<String>,
    pub link: Option<String>,
}

/// Strip surrounding whitespace and a leading `v`/`V`
pub fn normalize_version(version: &str) -> String {
    let trimmed = version.trim();
    trimmed
        .strip_prefix(['v', 'V'])
        .unwrap_or(trimmed)
        .to_string()
}

/// Tag name for a version: `v` prefixed unless it already is
pub fn version_tag(version: &str) -> String {
    let trimmed = version.trim();
    if trimmed.starts_with(['v', 'V']) {
        trimmed.to_string()
    } else {
        format!("v{}", trimmed)
    }
}

fn capture_text(caps: &regex::Captures<'_>, index: usize) -> Option<String> {
    caps.get(index)
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Release headings in document order (newest first for conventional changelogs).
///
/// Only headings whose version starts with a digit are returned, so
/// `## [Unreleased]` is ignored.
pub fn list_changelog_versions(changelog: &str) -> Result<Vec<ChangelogRelease>> {
    let heading = Regex::new(
        r"(?m)^##[ \t]*(?:\[v?([0-9][^\]\s]*)\](?:\((https?://[^)\s]*)\))?|v?([0-9][^\s(]*))[ \t]*(?:\(([^)]+)\))?[ \t]*\r?$",
    )?;

    Ok(heading
        .captures_iter(changelog)
        .filter_map(|caps| {
            let version = capture_text(&caps, 1).or_else(|| capture_text(&caps, 3))?;
            Some(ChangelogRelease {
                version,
                link: capture_text(&caps, 2),
                date: capture_text(&caps, 4),
            })
        })
        .collect())
}

/// Find the section for `version`: from its heading up to the next `## ` heading.
pub fn extract_release_block(changelog: &str, version: &str) -> Result<Option<ReleaseBlock>> {
    let escaped = regex::escape(&normalize_version(version));
    let heading = Regex::new(&format!(
        r"(?m)^##[ \t]*(?:\[v?{v}\](?:\((https?://[^)\s]*)\))?|v?{v})[ \t]*(?:\(([^)]+)\))?[ \t]*\r?$",
        v = escaped
    ))?;

    let Some(caps) = heading.captures(changelog) else {
        return Ok(None);
    };
    let Some(whole) = caps.get(0) else {
        return Ok(None);
    };

    let start = whole.start();
    let rest = &changelog[whole.end()..];
    let next_heading = Regex::new(r"(?m)^##[ \t]")?;
    let end = next_heading
        .find(rest)
        .map(|m| whole.end() + m.start())
        .unwrap_or(changelog.len());

    Ok(Some(ReleaseBlock {
        body: changelog[start..end].trim().to_string(),
        date: capture_text(&caps, 2),
        link: capture_text(&caps, 1),
    }))
}

/// Lowercase, with every character outside `[a-z0-9]` turned into a single `-`
pub fn slugify(value: &str) -> String {
    let mut slug = String::new();
    for ch in value.trim().to_lowercase().chars() {
        if ch.is_ascii_lowercase() || ch.is_ascii_digit() {
            slug.push(ch);
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.trim_matches('-').to_string()
}

fn section_slug(section: &str) -> String {
    let slug = slugify(section);
    if slug.is_empty() {
        "section".to_string()
    } else {
        slug
    }
}

/// Text after a single `-` or `*` list marker; the marker must be followed by whitespace
fn bullet_text(line: &str) -> Option<&str> {
    let rest = line.strip_prefix('-').or_else(|| line.strip_prefix('*'))?;
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    Some(rest.trim()).filter(|title| !title.is_empty())
}

/// Turn a release block into entries, one per bullet line
pub fn parse_release_entries(block: &str) -> Vec<ReleaseEntry> {
    let mut section = DEFAULT_SECTION.to_string();
    let mut entries = Vec::new();

    for line in block.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("## ") {
            continue;
        }
        if let Some(heading) = trimmed.strip_prefix("### ") {
            let heading = heading.trim();
            section = if heading.is_empty() {
                DEFAULT_SECTION.to_string()
            } else {
                heading.to_string()
            };
            continue;
        }
        let Some(title) = bullet_text(trimmed) else {
            continue;
        };

        let order = entries.len();
        let identifier = slugify(title);
        entries.push(ReleaseEntry {
            entry_key: format!("{}-{:04}", section_slug(&section), order),
            section: section.clone(),
            title: title.to_string(),
            order_index: order as i64,
            identifier: (!identifier.is_empty()).then_some(identifier),
        });
    }

    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHANGELOG: &str = "# Changelog

## [Unreleased]

* pending work

## [1.4.0](https://github.com/org/kv/compare/v1.3.0...v1.4.0) (2024-05-01)

### Features

* add private endpoint support ([#12](https://github.com/org/kv/issues/12))
* **network:** allow ip rules

### Bug Fixes

- fix key rotation

## 1.3.0 (2024-03-10)

- initial rotation policy

## v1.2.0

* older change
";

    #[test]
    fn test_list_versions() {
        let versions = list_changelog_versions(CHANGELOG).unwrap();
        let names: Vec<_> = versions.iter().map(|v| v.version.as_str()).collect();
        assert_eq!(names, vec!["1.4.0", "1.3.0", "1.2.0"]);
        assert_eq!(versions[0].date.as_deref(), Some("2024-05-01"));
        assert_eq!(
            versions[0].link.as_deref(),
            Some("https://github.com/org/kv/compare/v1.3.0...v1.4.0")
        );
        assert_eq!(versions[1].date.as_deref(), Some("2024-03-10"));
        assert_eq!(versions[1].link, None);
        assert_eq!(versions[2].date, None);
    }

    #[test]
    fn test_extract_block_stops_at_next_heading() {
        let block = extract_release_block(CHANGELOG, "v1.4.0").unwrap().unwrap();
        assert!(block.body.starts_with("## [1.4.0]"));
        assert!(block.body.contains("fix key rotation"));
        assert!(!block.body.contains("initial rotation policy"));
        assert_eq!(block.date.as_deref(), Some("2024-05-01"));

        let last = extract_release_block(CHANGELOG, "1.2.0").unwrap().unwrap();
        assert!(last.body.ends_with("* older change"));

        assert!(extract_release_block(CHANGELOG, "9.9.9").unwrap().is_none());
        // 1.4 must not match the 1.4.0 heading
        assert!(extract_release_block(CHANGELOG, "1.4").unwrap().is_none());
    }

    #[test]
    fn test_two_entries_share_section() {
        let block = "## 2.0.0\n\n### Features\n\n* first thing\n* second thing\n";
        let entries = parse_release_entries(block);
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|e| e.section == "Features"));
        assert_eq!(entries[0].order_index, 0);
        assert_eq!(entries[1].order_index, 1);
        assert_ne!(entries[0].entry_key, entries[1].entry_key);
        assert_eq!(entries[0].entry_key, "features-0000");
        assert_eq!(entries[0].identifier.as_deref(), Some("first-thing"));
    }

    #[test]
    fn test_entries_default_section_and_order() {
        let block = extract_release_block(CHANGELOG, "1.4.0").unwrap().unwrap();
        let entries = parse_release_entries(&block.body);
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[2].section, "Bug Fixes");
        assert_eq!(entries[2].entry_key, "bug-fixes-0002");
        assert_eq!(entries[1].title, "**network:** allow ip rules");
        assert_eq!(entries[1].identifier.as_deref(), Some("network-allow-ip-rules"));

        let orphan = parse_release_entries("* no heading here");
        assert_eq!(orphan[0].section, DEFAULT_SECTION);
        assert_eq!(orphan[0].entry_key, "other-0000");
    }

    #[test]
    fn test_only_list_markers_start_entries() {
        let block = "### Features\n\n\
* **kv:** keep bold scope\n\
- dash bullet\n\
*\ttab bullet\n\
**Full Changelog**: https://github.com/org/kv/compare/v1.0.0...v1.1.0\n\
---\n\
*\n";
        let titles: Vec<String> = parse_release_entries(block)
            .into_iter()
            .map(|e| e.title)
            .collect();
        assert_eq!(titles, vec!["**kv:** keep bold scope", "dash bullet", "tab bullet"]);
    }

    #[test]
    fn test_slugify_and_versions() {
        assert_eq!(slugify("  Add Private_Endpoint (#12) "), "add-private-endpoint-12");
        assert_eq!(slugify("---"), "");
        assert_eq!(normalize_version(" v1.2.0 "), "1.2.0");
        assert_eq!(version_tag("1.2.0"), "v1.2.0");
        assert_eq!(version_tag("v1.2.0"), "v1.2.0");
    }
}
