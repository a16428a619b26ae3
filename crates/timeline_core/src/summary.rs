//! Prepared decade summaries loaded from markdown files.
//!
//! Lookup order for a decade: `<start>s.md`, then `template.md` with
//! `{decade_name}`, `{start_year}` and `{end_year}` substituted, then a
//! built-in placeholder text. Files are read once by [`SummaryLibrary::load`];
//! lookups never touch the filesystem.

use crate::parser::decade::decade_name;
use log::{info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const TEMPLATE_FILE: &str = "template.md";

static HEADING_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^#{1,2} (.+)$").expect("valid heading regex"));
static BLANK_RUN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").expect("valid blank regex"));
static DECADE_FILE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})s\.md$").expect("valid decade file regex"));

/// Where a summary body came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummarySource {
    DecadeFile,
    Template,
    Fallback,
}

/// Rendered summary body, without the heading line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecadeSummary {
    pub source: SummarySource,
    pub body: String,
}

/// In-memory summary texts keyed by decade start year.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SummaryLibrary {
    decades: BTreeMap<i32, String>,
    template: Option<String>,
}

impl SummaryLibrary {
    /// Reads `<start>s.md` files and `template.md` from `dir`.
    ///
    /// A missing directory yields an empty library; unreadable files are
    /// logged and skipped.
    pub fn load(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let mut library = Self::default();
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(err) => {
                info!(
                    "event=summary_load module=summary status=skip path={} error={}",
                    dir.display(),
                    err
                );
                return library;
            }
        };

        for entry in entries.flatten() {
            let path = entry.path();
            let Some(file_name) = path.file_name().and_then(|name| name.to_str()) else {
                continue;
            };
            if file_name == TEMPLATE_FILE {
                library.template = read_optional(&path);
            } else if let Some(start_year) = DECADE_FILE_RE
                .captures(file_name)
                .and_then(|captures| captures[1].parse::<i32>().ok())
                .filter(|year| year % 10 == 0)
            {
                if let Some(text) = read_optional(&path) {
                    library.decades.insert(start_year, text);
                }
            }
        }

        info!(
            "event=summary_load module=summary status=ok decades={} template={}",
            library.decades.len(),
            library.template.is_some()
        );
        library
    }

    /// Library without files; every lookup yields the fallback text.
    pub fn builtin() -> Self {
        Self::default()
    }

    /// Returns the summary for `start_year..=end_year`.
    pub fn decade_summary(&self, start_year: i32, end_year: i32) -> DecadeSummary {
        let name = decade_name(start_year, end_year);

        if start_year % 10 == 0 && end_year == start_year + 9 {
            if let Some(text) = self.decades.get(&start_year) {
                return DecadeSummary {
                    source: SummarySource::DecadeFile,
                    body: to_post_markdown(text),
                };
            }
        }

        match self.template.as_deref() {
            Some(template) => {
                let text = template
                    .replace("{decade_name}", &name)
                    .replace("{start_year}", &start_year.to_string())
                    .replace("{end_year}", &end_year.to_string());
                DecadeSummary {
                    source: SummarySource::Template,
                    body: to_post_markdown(&text),
                }
            }
            None => fallback(&name),
        }
    }
}

fn read_optional(path: &Path) -> Option<String> {
    if !path.is_file() {
        return None;
    }
    match std::fs::read_to_string(path) {
        Ok(text) => Some(text),
        Err(err) => {
            warn!(
                "event=summary_read module=summary status=error path={} error={}",
                path.display(),
                err
            );
            None
        }
    }
}

/// Turns `#`/`##` headings into bold lines and collapses blank runs.
fn to_post_markdown(text: &str) -> String {
    let bolded = HEADING_RE.replace_all(text, "**$1**");
    BLANK_RUN_RE.replace_all(&bolded, "\n\n").trim().to_string()
}

fn fallback(name: &str) -> DecadeSummary {
    DecadeSummary {
        source: SummarySource::Fallback,
        body: format!(
            "{name}の詳細な概要は準備中です。\n\nこの年代の分散SNS関連技術の発展について、詳細な情報を収集・整理中です。"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::{SummaryLibrary, SummarySource};
    use std::fs;

    #[test]
    fn decade_file_wins_and_headings_become_bold() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("1990s.md"), "# 黎明期\n\n\n\n本文").unwrap();
        fs::write(dir.path().join("template.md"), "{decade_name}").unwrap();

        let summary = SummaryLibrary::load(dir.path()).decade_summary(1990, 1999);
        assert_eq!(summary.source, SummarySource::DecadeFile);
        assert_eq!(summary.body, "**黎明期**\n\n本文");
    }

    #[test]
    fn template_placeholders_are_substituted() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("template.md"),
            "## {decade_name}\n{start_year}-{end_year}",
        )
        .unwrap();

        let summary = SummaryLibrary::load(dir.path()).decade_summary(2010, 2019);
        assert_eq!(summary.source, SummarySource::Template);
        assert_eq!(summary.body, "**2010年代**\n2010-2019");
    }

    #[test]
    fn missing_files_use_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let summary = SummaryLibrary::load(dir.path()).decade_summary(1980, 1989);
        assert_eq!(summary.source, SummarySource::Fallback);
        assert!(summary.body.starts_with("1980年代の詳細な概要は準備中です。"));
        assert_eq!(
            SummaryLibrary::builtin().decade_summary(1980, 1989).source,
            SummarySource::Fallback
        );
        assert_eq!(
            SummaryLibrary::load(dir.path().join("absent")).decade_summary(1980, 1989).source,
            SummarySource::Fallback
        );
    }

    #[test]
    fn lookups_use_texts_read_at_load_time() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("2000s.md"), "ゼロ年代").unwrap();
        fs::write(dir.path().join("notes.md"), "ignored").unwrap();
        let library = SummaryLibrary::load(dir.path());

        fs::remove_file(dir.path().join("2000s.md")).unwrap();
        let summary = library.decade_summary(2000, 2009);
        assert_eq!(summary.source, SummarySource::DecadeFile);
        assert_eq!(summary.body, "ゼロ年代");
        assert_eq!(library.decade_summary(2000, 2009), summary);
    }
}
