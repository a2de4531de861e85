//! Result persistence
//!
//! Each application gets a directory named after its sanitized name,
//! holding the full result as JSON plus a Markdown rendering of the
//! question/answer pairs. Written once per run; no concurrent writers
//! to the same path.

use crate::error::{ApplyError, Result};
use crate::types::ProcessingResult;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Summary row for the results listing
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct StoredResultSummary {
    pub app_name: String,
    pub directory: String,
    pub status: String,
    pub finished_at: String,
}

/// Filesystem store for processing results.
#[derive(Clone)]
pub struct ResultStore {
    root: PathBuf,
}

impl ResultStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write `results.json` and `answers.md` for one result.
    /// Returns the application's directory.
    pub fn save(&self, result: &ProcessingResult) -> Result<PathBuf> {
        let dir = self.root.join(sanitize_filename(&result.app_name));
        fs::create_dir_all(&dir).map_err(ApplyError::Persist)?;

        let json = serde_json::to_string_pretty(result)
            .map_err(|e| ApplyError::Persist(std::io::Error::other(e)))?;
        fs::write(dir.join("results.json"), json).map_err(ApplyError::Persist)?;

        fs::write(dir.join("answers.md"), render_answers_markdown(result))
            .map_err(ApplyError::Persist)?;

        debug!(app = %result.app_name, dir = %dir.display(), "results persisted");
        Ok(dir)
    }

    /// List saved results, newest first.
    pub fn list(&self) -> Result<Vec<StoredResultSummary>> {
        let mut summaries = Vec::new();
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            // No runs yet
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(summaries),
            Err(e) => return Err(ApplyError::Persist(e)),
        };

        for entry in entries.flatten() {
            let path = entry.path().join("results.json");
            let Ok(text) = fs::read_to_string(&path) else {
                continue;
            };
            let Ok(result) = serde_json::from_str::<ProcessingResult>(&text) else {
                continue;
            };
            summaries.push(StoredResultSummary {
                app_name: result.app_name,
                directory: entry.file_name().to_string_lossy().into_owned(),
                status: format!("{:?}", result.status).to_lowercase(),
                finished_at: result.finished_at.to_rfc3339(),
            });
        }

        summaries.sort_by(|a, b| b.finished_at.cmp(&a.finished_at));
        Ok(summaries)
    }

    /// Load one saved result by directory name.
    pub fn load(&self, name: &str) -> Result<Option<ProcessingResult>> {
        let path = self.root.join(sanitize_filename(name)).join("results.json");
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(ApplyError::Persist(e)),
        };
        let result = serde_json::from_str(&text)
            .map_err(|e| ApplyError::Persist(std::io::Error::other(e)))?;
        Ok(Some(result))
    }
}

/// Make an application name safe for use as a directory name.
pub fn sanitize_filename(name: &str) -> String {
    let mut out: String = name
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    if out.len() > 200 {
        let mut cut = 200;
        while !out.is_char_boundary(cut) {
            cut -= 1;
        }
        out.truncate(cut);
    }
    let out = out.trim_matches(['.', ' ']).to_string();
    if out.is_empty() {
        "unnamed".to_string()
    } else {
        out
    }
}

/// Human-readable rendering of the question/answer pairs.
fn render_answers_markdown(result: &ProcessingResult) -> String {
    let mut out = String::new();
    out.push_str(&format!("# Answers for {}\n\n", result.app_name));
    out.push_str(&format!(
        "Generated on: {}\n\n",
        result.finished_at.to_rfc3339()
    ));

    if result.answers.is_empty() {
        out.push_str("_No answers were generated._\n");
    }

    for (i, answer) in result.answers.iter().enumerate() {
        out.push_str(&format!("## Question {}\n", i + 1));
        out.push_str(&format!("**{}**\n\n", answer.question));
        out.push_str(&format!("{}\n\n", answer.answer));
        out.push_str(&format!("*Confidence: {:?}*\n\n", answer.confidence));
        if let Some(notes) = &answer.notes {
            out.push_str(&format!("*Notes: {notes}*\n\n"));
        }
        out.push_str("---\n\n");
    }

    if !result.errors.is_empty() {
        out.push_str("## Errors\n\n");
        for error in &result.errors {
            out.push_str(&format!("- `{:?}`: {}\n", error.stage, error.message));
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Answer, Confidence, ProcessingStatus};
    use chrono::Utc;

    fn sample_result(name: &str) -> ProcessingResult {
        ProcessingResult {
            app_name: name.to_string(),
            info_url: "https://example.com/info".into(),
            form_url: "https://example.com/apply".into(),
            status: ProcessingStatus::Success,
            application_info: serde_json::json!({"name": name}),
            questions: Vec::new(),
            answers: vec![Answer {
                question: "Why do you apply?".into(),
                answer: "Because it fits.".into(),
                confidence: Confidence::High,
                notes: Some("review tone".into()),
            }],
            errors: Vec::new(),
            started_at: Utc::now(),
            finished_at: Utc::now(),
        }
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("Acme Corp"), "Acme Corp");
        assert_eq!(sanitize_filename("a/b\\c:d"), "a_b_c_d");
        assert_eq!(sanitize_filename("  .hidden.  "), "hidden");
        assert_eq!(sanitize_filename(""), "unnamed");
        assert_eq!(sanitize_filename("..."), "unnamed");
        assert_eq!(sanitize_filename(&"x".repeat(300)).len(), 200);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResultStore::new(dir.path());
        let result = sample_result("Acme Grant");

        let written = store.save(&result).unwrap();
        assert!(written.join("results.json").exists());
        assert!(written.join("answers.md").exists());

        let loaded = store.load("Acme Grant").unwrap().unwrap();
        assert_eq!(loaded.app_name, "Acme Grant");
        assert_eq!(loaded.answers.len(), 1);

        let markdown = std::fs::read_to_string(written.join("answers.md")).unwrap();
        assert!(markdown.contains("Why do you apply?"));
        assert!(markdown.contains("Because it fits."));
        assert!(markdown.contains("review tone"));
    }

    #[test]
    fn test_load_missing_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResultStore::new(dir.path());
        assert!(store.load("nope").unwrap().is_none());
    }

    #[test]
    fn test_list_sorted_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResultStore::new(dir.path());

        let mut older = sample_result("Older");
        older.finished_at = Utc::now() - chrono::Duration::hours(1);
        store.save(&older).unwrap();
        store.save(&sample_result("Newer")).unwrap();

        let listing = store.list().unwrap();
        assert_eq!(listing.len(), 2);
        assert_eq!(listing[0].app_name, "Newer");
        assert_eq!(listing[1].app_name, "Older");
    }

    #[test]
    fn test_list_empty_root() {
        let store = ResultStore::new("/nonexistent/path/for/applykit/tests");
        assert!(store.list().unwrap().is_empty());
    }
}
