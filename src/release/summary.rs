//! Plain-text rendering of releases and located patches

use crate::models::{ModuleRelease, ReleaseEntry};
use chrono::NaiveDate;
use std::collections::HashMap;
use std::fmt::Write;

use super::changelog::DEFAULT_SECTION;

/// Sections listed first, in this order, when present
const PREFERRED_SECTIONS: [&str; 5] = [
    "Features",
    "Enhancements",
    "Bug Fixes",
    "Breaking Changes",
    "Security",
];

/// Entry titles grouped by section, in display order
pub fn group_by_section(entries: &[ReleaseEntry]) -> Vec<(String, Vec<String>)> {
    let mut appearance: Vec<String> = Vec::new();
    let mut titles: HashMap<String, Vec<String>> = HashMap::new();

    for entry in entries {
        let section = match entry.section.trim() {
            "" => DEFAULT_SECTION.to_string(),
            s => s.to_string(),
        };
        if !titles.contains_key(&section) {
            appearance.push(section.clone());
        }
        titles.entry(section).or_default().push(entry.title.clone());
    }

    let mut ordered = Vec::with_capacity(appearance.len());
    for preferred in PREFERRED_SECTIONS {
        if let Some(list) = titles.remove(preferred) {
            ordered.push((preferred.to_string(), list));
        }
    }
    for section in appearance {
        if let Some(list) = titles.remove(&section) {
            ordered.push((section, list));
        }
    }
    ordered
}

pub fn short_sha(sha: &str) -> &str {
    sha.get(..7).unwrap_or(sha)
}

fn format_tag(tag: &str, sha: Option<&str>) -> Option<String> {
    let tag = tag.trim();
    if tag.is_empty() {
        return None;
    }
    Some(match sha.filter(|s| !s.is_empty()) {
        Some(sha) => format!("{} ({})", tag, short_sha(sha)),
        None => tag.to_string(),
    })
}

/// `prev (sha7) → tag (sha7)`, or just the tag without a previous one
pub fn render_range(release: &ModuleRelease) -> String {
    let head = format_tag(&release.tag, release.commit_sha.as_deref()).unwrap_or_default();
    let prev = release
        .previous_tag
        .as_deref()
        .and_then(|tag| format_tag(tag, release.previous_commit_sha.as_deref()));
    match prev {
        Some(prev) => format!("{} → {}", prev, head),
        None => head,
    }
}

/// `January 2, 2006` for ISO dates; other text verbatim; `unknown` when absent
pub fn render_date(release: &ModuleRelease) -> String {
    match release.release_date.as_deref().filter(|d| !d.is_empty()) {
        Some(date) => NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .map(|d| d.format("%B %-d, %Y").to_string())
            .unwrap_or_else(|_| date.to_string()),
        None => "unknown".to_string(),
    }
}

pub fn render_summary(module_name: &str, release: &ModuleRelease, entries: &[ReleaseEntry]) -> String {
    let mut out = String::from("Module Release Summary\n");
    let _ = writeln!(out, "- Module: {}", module_name);
    let _ = writeln!(out, "- Range: {}", render_range(release));
    let _ = writeln!(out, "- Date: {}", render_date(release));

    let sections = group_by_section(entries);
    if sections.is_empty() {
        out.push_str("- No categorized entries found\n");
        return out;
    }
    for (section, titles) in sections {
        let _ = writeln!(out, "- {}", section);
        for title in titles {
            let _ = writeln!(out, "    - {}", title);
        }
    }
    out
}

/// A located patch ready for display
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseSnippet {
    pub module: String,
    pub version: String,
    pub title: String,
    pub filename: String,
    pub patch: String,
    pub truncated: bool,
    pub max_lines: usize,
    pub comparison_url: Option<String>,
}

impl std::fmt::Display for ReleaseSnippet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Release {} – {}", self.version, self.title)?;
        writeln!(f, "Module: {}", self.module)?;
        writeln!(f, "File: {}", self.filename)?;
        write!(f, "```diff\n{}\n```", self.patch)?;
        if self.truncated {
            write!(f, "\n… showing first {} diff lines", self.max_lines)?;
        }
        if let Some(url) = self.comparison_url.as_deref().filter(|u| !u.is_empty()) {
            write!(f, "\nCompare: {}", url)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn release() -> ModuleRelease {
        ModuleRelease {
            id: 1,
            module_id: 1,
            version: "1.4.0".into(),
            tag: "v1.4.0".into(),
            release_date: Some("2024-05-01".into()),
            previous_tag: Some("v1.3.0".into()),
            commit_sha: Some("0123456789abcdef".into()),
            previous_commit_sha: None,
            comparison_url: None,
        }
    }

    fn entry(section: &str, title: &str) -> ReleaseEntry {
        ReleaseEntry {
            section: section.into(),
            entry_key: String::new(),
            title: title.into(),
            order_index: 0,
            identifier: None,
        }
    }

    #[test]
    fn test_preferred_sections_come_first() {
        let entries = vec![
            entry("Miscellaneous", "chore"),
            entry("Bug Fixes", "fix a"),
            entry("Features", "feat a"),
            entry("Bug Fixes", "fix b"),
            entry("", "orphan"),
        ];
        let groups = group_by_section(&entries);
        let names: Vec<_> = groups.iter().map(|(s, _)| s.as_str()).collect();
        assert_eq!(names, vec!["Features", "Bug Fixes", "Miscellaneous", "Other"]);
        assert_eq!(groups[1].1, vec!["fix a", "fix b"]);
    }

    #[test]
    fn test_range_and_date() {
        let mut r = release();
        assert_eq!(render_range(&r), "v1.3.0 → v1.4.0 (0123456)");
        assert_eq!(render_date(&r), "May 1, 2024");

        r.previous_tag = None;
        r.commit_sha = None;
        r.release_date = Some("someday".into());
        assert_eq!(render_range(&r), "v1.4.0");
        assert_eq!(render_date(&r), "someday");

        r.release_date = None;
        assert_eq!(render_date(&r), "unknown");
    }

    #[test]
    fn test_render_summary() {
        let text = render_summary("terraform-azure-kv", &release(), &[entry("Features", "add x")]);
        assert_eq!(
            text,
            "Module Release Summary\n- Module: terraform-azure-kv\n- Range: v1.3.0 → v1.4.0 (0123456)\n- Date: May 1, 2024\n- Features\n    - add x\n"
        );

        let empty = render_summary("m", &release(), &[]);
        assert!(empty.ends_with("- No categorized entries found\n"));
    }

    #[test]
    fn test_snippet_display() {
        let snippet = ReleaseSnippet {
            module: "terraform-azure-kv".into(),
            version: "1.4.0".into(),
            title: "add x".into(),
            filename: "main.tf".into(),
            patch: "+a".into(),
            truncated: true,
            max_lines: 1,
            comparison_url: Some("https://example.com/compare".into()),
        };
        assert_eq!(
            snippet.to_string(),
            "Release 1.4.0 – add x\nModule: terraform-azure-kv\nFile: main.tf\n```diff\n+a\n```\n… showing first 1 diff lines\nCompare: https://example.com/compare"
        );
    }
}
