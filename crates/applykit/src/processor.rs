//! Processing pipeline
//!
//! Sequencing for one application: fan out the info branch
//! (scrape → info extraction) and the form branch (scrape → question
//! extraction) concurrently, join both, generate answers when anything
//! usable came back, and persist the aggregate. A branch failure is
//! captured as data and never cancels the sibling.

use crate::error::{ApplyError, Result};
use crate::llm::LlmClient;
use crate::prompts::{PromptKind, PromptVars};
use crate::scrape::Scraper;
use crate::store::ResultStore;
use crate::types::{
    Answer, ApplicationInfo, ProcessingError, ProcessingResult, ProcessingStatus, Question, Stage,
};
use crate::validate::validate_url_with;
use chrono::Utc;
use serde_json::Value;
use tracing::{info, warn};

/// One application to process
#[derive(Debug, Clone)]
pub struct ProcessRequest {
    /// Name used for logging and the output directory
    pub app_name: String,
    /// Page describing the program
    pub info_url: String,
    /// Page containing the form
    pub form_url: String,
}

/// Orchestrates scraper → LLM for one application at a time.
pub struct Processor {
    scraper: Scraper,
    llm: LlmClient,
    store: Option<ResultStore>,
}

impl Processor {
    pub fn new(scraper: Scraper, llm: LlmClient) -> Self {
        Self {
            scraper,
            llm,
            store: None,
        }
    }

    /// Persist every result through `store` as the terminal step.
    pub fn with_store(mut self, store: ResultStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Run the full pipeline for one application.
    ///
    /// Always returns a `ProcessingResult`; failures along the way become
    /// entries in its `errors` list. Partial results beat total failure.
    pub async fn process(&self, req: &ProcessRequest) -> ProcessingResult {
        let started_at = Utc::now();
        info!(app = %req.app_name, info_url = %req.info_url, form_url = %req.form_url, "processing application");

        let mut errors = Vec::new();

        let allow_internal = self.scraper.options().allow_internal;
        let info_valid = match validate_url_with(&req.info_url, allow_internal) {
            Ok(_) => true,
            Err(e) => {
                errors.push(ProcessingError::new(
                    Stage::Validation,
                    format!("info URL: {e}"),
                ));
                false
            }
        };
        let form_valid = match validate_url_with(&req.form_url, allow_internal) {
            Ok(_) => true,
            Err(e) => {
                errors.push(ProcessingError::new(
                    Stage::Validation,
                    format!("form URL: {e}"),
                ));
                false
            }
        };

        // A branch with an invalid URL is skipped outright; the validation
        // entry above already accounts for it.
        let (info_outcome, questions_outcome) = tokio::join!(
            async {
                if info_valid {
                    Some(self.run_info_branch(req).await)
                } else {
                    None
                }
            },
            async {
                if form_valid {
                    Some(self.run_form_branch(req).await)
                } else {
                    None
                }
            },
        );

        let application_info = match info_outcome {
            Some(Ok(info)) => info,
            Some(Err(e)) => {
                errors.push(e);
                Value::Null
            }
            None => Value::Null,
        };
        let questions = match questions_outcome {
            Some(Ok(questions)) => questions,
            Some(Err(e)) => {
                errors.push(e);
                Vec::new()
            }
            None => Vec::new(),
        };

        // Answer generation is skipped when there are no questions; that is
        // a zero-answer result, not an error. Empty info is allowed: answers
        // may come back low-confidence, which the confidence field surfaces.
        let answers = if questions.is_empty() {
            Vec::new()
        } else {
            match self
                .generate_answers(&req.app_name, &application_info, &questions)
                .await
            {
                Ok(answers) => answers,
                Err(e) => {
                    errors.push(ProcessingError::new(Stage::AnswerGeneration, error_message(&e)));
                    Vec::new()
                }
            }
        };

        let mut result = ProcessingResult {
            app_name: req.app_name.clone(),
            info_url: req.info_url.clone(),
            form_url: req.form_url.clone(),
            status: ProcessingStatus::Failed,
            application_info,
            questions,
            answers,
            errors,
            started_at,
            finished_at: Utc::now(),
        };
        if result.errors.is_empty() {
            result.status = ProcessingStatus::Success;
        } else if result.has_data() {
            result.status = ProcessingStatus::Partial;
        }

        // Persist even on partial failure so partial work is never lost.
        // A write failure is recorded, not rolled back: the in-memory
        // result still goes back to the caller.
        if let Some(store) = &self.store {
            if let Err(e) = store.save(&result) {
                warn!(app = %req.app_name, error = %e, "failed to persist results");
                result
                    .errors
                    .push(ProcessingError::new(Stage::Persistence, e.to_string()));
            }
        }

        info!(app = %req.app_name, status = ?result.status,
              questions = result.questions.len(), answers = result.answers.len(),
              errors = result.errors.len(), "processing finished");
        result
    }

    async fn run_info_branch(
        &self,
        req: &ProcessRequest,
    ) -> std::result::Result<ApplicationInfo, ProcessingError> {
        let scraped = self.scraper.fetch(&req.info_url).await;
        let content = match scraped.content {
            Some(content) if scraped.success => content,
            _ => {
                return Err(ProcessingError::new(
                    Stage::InfoScrape,
                    scraped.error.unwrap_or_else(|| "no content returned".into()),
                ))
            }
        };

        self.extract_info_from_content(&req.app_name, &content)
            .await
            .map_err(|e| ProcessingError::new(Stage::InfoExtract, error_message(&e)))
    }

    async fn run_form_branch(
        &self,
        req: &ProcessRequest,
    ) -> std::result::Result<Vec<Question>, ProcessingError> {
        let scraped = self.scraper.fetch(&req.form_url).await;
        let content = match scraped.content {
            Some(content) if scraped.success => content,
            _ => {
                return Err(ProcessingError::new(
                    Stage::FormScrape,
                    scraped.error.unwrap_or_else(|| "no content returned".into()),
                ))
            }
        };

        self.extract_questions_from_content(&req.app_name, &content)
            .await
            .map_err(|e| ProcessingError::new(Stage::QuestionExtract, error_message(&e)))
    }

    /// Scrape one info page and extract program facts.
    ///
    /// Backs the single-purpose endpoint; `process` goes through the
    /// branch variants instead.
    pub async fn extract_info(&self, url: &str, app_name: &str) -> Result<ApplicationInfo> {
        validate_url_with(url, self.scraper.options().allow_internal)?;
        let scraped = self.scraper.fetch(url).await;
        let content = match scraped.content {
            Some(content) if scraped.success => content,
            _ => {
                return Err(ApplyError::Scrape(
                    scraped.error.unwrap_or_else(|| "no content returned".into()),
                ))
            }
        };
        self.extract_info_from_content(app_name, &content).await
    }

    /// Scrape one form page and extract its questions.
    pub async fn extract_questions(&self, url: &str, app_name: &str) -> Result<Vec<Question>> {
        validate_url_with(url, self.scraper.options().allow_internal)?;
        let scraped = self.scraper.fetch(url).await;
        let content = match scraped.content {
            Some(content) if scraped.success => content,
            _ => {
                return Err(ApplyError::Scrape(
                    scraped.error.unwrap_or_else(|| "no content returned".into()),
                ))
            }
        };
        self.extract_questions_from_content(app_name, &content).await
    }

    async fn extract_info_from_content(
        &self,
        app_name: &str,
        content: &str,
    ) -> Result<ApplicationInfo> {
        let vars = PromptVars {
            app_name: app_name.to_string(),
            content: content.to_string(),
            ..Default::default()
        };
        let outcome = self.llm.call(PromptKind::InfoExtraction, &vars).await?;
        Ok(outcome.value)
    }

    async fn extract_questions_from_content(
        &self,
        app_name: &str,
        content: &str,
    ) -> Result<Vec<Question>> {
        let vars = PromptVars {
            app_name: app_name.to_string(),
            content: content.to_string(),
            ..Default::default()
        };
        let outcome = self.llm.call(PromptKind::QuestionExtraction, &vars).await?;
        Ok(coerce_questions(outcome.value))
    }

    /// Generate one answer per question from the extracted info.
    ///
    /// `info` may be null/empty; the model is told what it has.
    pub async fn generate_answers(
        &self,
        app_name: &str,
        info: &ApplicationInfo,
        questions: &[Question],
    ) -> Result<Vec<Answer>> {
        let info_text = if info.is_null() {
            "{}".to_string()
        } else {
            serde_json::to_string_pretty(info).unwrap_or_else(|_| "{}".into())
        };
        let questions_text =
            serde_json::to_string_pretty(questions).unwrap_or_else(|_| "[]".into());

        let vars = PromptVars {
            app_name: app_name.to_string(),
            info: info_text,
            questions: questions_text,
            ..Default::default()
        };
        let outcome = self.llm.call(PromptKind::AnswerGeneration, &vars).await?;
        Ok(coerce_answers(outcome.value))
    }
}

/// Accept either a bare array or an object wrapping a `questions` array.
/// Items that do not deserialize are skipped rather than failing the batch.
pub fn coerce_questions(value: Value) -> Vec<Question> {
    let items = unwrap_array(value, "questions");
    items
        .into_iter()
        .filter_map(|item| serde_json::from_value::<Question>(item).ok())
        .filter(|q| !q.text.trim().is_empty())
        .collect()
}

/// Accept either a bare array or an object wrapping an `answers` array.
pub fn coerce_answers(value: Value) -> Vec<Answer> {
    let items = unwrap_array(value, "answers");
    items
        .into_iter()
        .filter_map(|item| serde_json::from_value::<Answer>(item).ok())
        .collect()
}

/// Error text for a `ProcessingError` entry; LLM failures keep their
/// correlation id so persisted errors can be matched against logs.
fn error_message(err: &ApplyError) -> String {
    match err.request_id() {
        Some(id) => format!("{err} (request {id})"),
        None => err.to_string(),
    }
}

fn unwrap_array(value: Value, key: &str) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove(key) {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::QuestionKind;
    use serde_json::json;

    #[test]
    fn test_coerce_questions_bare_array() {
        let questions = coerce_questions(json!([
            {"text": "Your name?", "type": "text", "required": true},
            {"question": "Tell us why", "type": "textarea"}
        ]));
        assert_eq!(questions.len(), 2);
        assert_eq!(questions[0].text, "Your name?");
        assert!(questions[0].required);
        assert_eq!(questions[1].kind, QuestionKind::Textarea);
    }

    #[test]
    fn test_coerce_questions_wrapped_object() {
        let questions = coerce_questions(json!({
            "questions": [{"text": "Q1"}, {"text": "Q2"}]
        }));
        assert_eq!(questions.len(), 2);
    }

    #[test]
    fn test_coerce_questions_skips_junk() {
        let questions = coerce_questions(json!([
            {"text": "Real question"},
            {"no_text_field": true},
            {"text": "   "},
            "a bare string"
        ]));
        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].text, "Real question");
    }

    #[test]
    fn test_coerce_questions_preserves_order() {
        let questions = coerce_questions(json!([
            {"text": "First"}, {"text": "Second"}, {"text": "Third"}
        ]));
        let texts: Vec<_> = questions.iter().map(|q| q.text.as_str()).collect();
        assert_eq!(texts, ["First", "Second", "Third"]);
    }

    #[test]
    fn test_coerce_answers_both_shapes() {
        let bare = coerce_answers(json!([
            {"question": "Q", "answer": "A", "confidence": "low", "notes": "check me"}
        ]));
        assert_eq!(bare.len(), 1);
        assert_eq!(bare[0].notes.as_deref(), Some("check me"));

        let wrapped = coerce_answers(json!({"answers": [{"question": "Q", "answer": "A"}]}));
        assert_eq!(wrapped.len(), 1);
    }

    #[test]
    fn test_coerce_answers_non_payload() {
        assert!(coerce_answers(json!("just a string")).is_empty());
        assert!(coerce_answers(json!({"unrelated": 1})).is_empty());
    }
}
