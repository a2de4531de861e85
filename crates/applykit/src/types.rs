//! Core types for ApplyKit

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Result of fetching one page. All failure is data: `success == false`
/// carries a human-readable `error` instead of propagating an exception,
/// so a failed branch never aborts its sibling.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ScrapeResult {
    /// The requested URL
    pub url: String,
    /// Whether content was obtained
    pub success: bool,
    /// Prepared page content (scripts/styles stripped, whitespace collapsed)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Failure description when `success` is false
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// When the fetch completed
    pub fetched_at: DateTime<Utc>,
    /// Whether this result was served from the cache
    #[serde(default)]
    pub from_cache: bool,
    /// Wall time of the fetch in milliseconds
    #[serde(default)]
    pub elapsed_ms: u64,
}

impl ScrapeResult {
    /// Successful fetch with prepared content
    pub fn ok(url: impl Into<String>, content: impl Into<String>, elapsed_ms: u64) -> Self {
        Self {
            url: url.into(),
            success: true,
            content: Some(content.into()),
            error: None,
            fetched_at: Utc::now(),
            from_cache: false,
            elapsed_ms,
        }
    }

    /// Failed fetch with a human-readable reason
    pub fn err(url: impl Into<String>, error: impl Into<String>, elapsed_ms: u64) -> Self {
        Self {
            url: url.into(),
            success: false,
            content: None,
            error: Some(error.into()),
            fetched_at: Utc::now(),
            from_cache: false,
            elapsed_ms,
        }
    }
}

/// Kind of form field a question was extracted from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum QuestionKind {
    #[default]
    Text,
    Textarea,
    Select,
    Radio,
    Checkbox,
    Email,
    Date,
    Number,
    File,
    Url,
    /// Anything the extractor reported that we do not model
    #[serde(other)]
    Other,
}

/// One question extracted from an application form.
/// Order matches the source form.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct Question {
    /// The question or label text as shown to users
    #[serde(alias = "question")]
    pub text: String,
    /// Input type
    #[serde(default, alias = "type")]
    pub kind: QuestionKind,
    /// Whether the field appears to be required
    #[serde(default)]
    pub required: bool,
    /// Options for select/radio/checkbox fields
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    /// HTML name/id attribute when available
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_name: Option<String>,
    /// Helper text or instructions attached to the field
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help_text: Option<String>,
}

/// LLM self-reported certainty for a generated answer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Low,
    #[default]
    #[serde(other)]
    Medium,
}

/// A generated answer, matched to its question by text
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Answer {
    /// The original question text
    pub question: String,
    /// Generated answer text
    pub answer: String,
    /// Self-reported confidence
    #[serde(default)]
    pub confidence: Confidence,
    /// Caveats or guidance for review
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Extracted program/company facts. The schema is advisory: whatever the
/// extractor returned is kept as-is.
pub type ApplicationInfo = serde_json::Value;

/// Terminal status of one application run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingStatus {
    /// Everything worked
    Success,
    /// Some data was produced alongside errors
    Partial,
    /// Both branches failed, no usable data
    Failed,
}

/// Pipeline stage an error was recorded at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    Validation,
    InfoScrape,
    FormScrape,
    InfoExtract,
    QuestionExtract,
    AnswerGeneration,
    Persistence,
}

/// One failure captured during processing
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ProcessingError {
    /// Where in the pipeline the failure occurred
    pub stage: Stage,
    /// Human-readable description
    pub message: String,
}

impl ProcessingError {
    pub fn new(stage: Stage, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
        }
    }
}

/// Aggregated outcome of processing one application. Created once per run,
/// written to disk as the terminal step, never mutated after persistence.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ProcessingResult {
    /// Application name (used for the output directory)
    pub app_name: String,
    /// Page describing the program
    pub info_url: String,
    /// Page containing the form
    pub form_url: String,
    /// Terminal status
    pub status: ProcessingStatus,
    /// Extracted program facts (advisory schema)
    #[serde(default)]
    pub application_info: ApplicationInfo,
    /// Questions in source-form order
    #[serde(default)]
    pub questions: Vec<Question>,
    /// One answer per question, matched by text
    #[serde(default)]
    pub answers: Vec<Answer>,
    /// Every failure captured along the way
    #[serde(default)]
    pub errors: Vec<ProcessingError>,
    /// When processing started
    pub started_at: DateTime<Utc>,
    /// When processing finished
    pub finished_at: DateTime<Utc>,
}

impl ProcessingResult {
    /// True if at least one branch produced usable data
    pub fn has_data(&self) -> bool {
        !self.application_info.is_null() || !self.questions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_question_kind_aliases() {
        let q: Question =
            serde_json::from_str(r#"{"question": "Your name?", "type": "text", "required": true}"#)
                .unwrap();
        assert_eq!(q.text, "Your name?");
        assert_eq!(q.kind, QuestionKind::Text);
        assert!(q.required);
    }

    #[test]
    fn test_question_kind_unknown_falls_back() {
        let q: Question =
            serde_json::from_str(r#"{"text": "Resume", "type": "dropzone"}"#).unwrap();
        assert_eq!(q.kind, QuestionKind::Other);
        assert!(!q.required);
    }

    #[test]
    fn test_confidence_default_and_unknown() {
        let a: Answer =
            serde_json::from_str(r#"{"question": "Q", "answer": "A"}"#).unwrap();
        assert_eq!(a.confidence, Confidence::Medium);

        let a: Answer =
            serde_json::from_str(r#"{"question": "Q", "answer": "A", "confidence": "very sure"}"#)
                .unwrap();
        assert_eq!(a.confidence, Confidence::Medium);

        let a: Answer =
            serde_json::from_str(r#"{"question": "Q", "answer": "A", "confidence": "high"}"#)
                .unwrap();
        assert_eq!(a.confidence, Confidence::High);
    }

    #[test]
    fn test_scrape_result_constructors() {
        let ok = ScrapeResult::ok("https://example.com", "content", 12);
        assert!(ok.success);
        assert_eq!(ok.content.as_deref(), Some("content"));
        assert!(ok.error.is_none());

        let err = ScrapeResult::err("https://example.com", "timed out", 30_000);
        assert!(!err.success);
        assert!(err.content.is_none());
        assert_eq!(err.error.as_deref(), Some("timed out"));
    }

    #[test]
    fn test_has_data() {
        let mut result = ProcessingResult {
            app_name: "Acme".into(),
            info_url: "https://example.com/info".into(),
            form_url: "https://example.com/apply".into(),
            status: ProcessingStatus::Failed,
            application_info: serde_json::Value::Null,
            questions: Vec::new(),
            answers: Vec::new(),
            errors: Vec::new(),
            started_at: Utc::now(),
            finished_at: Utc::now(),
        };
        assert!(!result.has_data());

        result.questions.push(Question {
            text: "Why?".into(),
            ..Default::default()
        });
        assert!(result.has_data());

        result.questions.clear();
        result.application_info = serde_json::json!({"name": "Acme"});
        assert!(result.has_data());
    }

    #[test]
    fn test_status_serialization() {
        assert_eq!(
            serde_json::to_string(&ProcessingStatus::Partial).unwrap(),
            "\"partial\""
        );
        assert_eq!(
            serde_json::to_string(&Stage::AnswerGeneration).unwrap(),
            "\"answer-generation\""
        );
    }
}
