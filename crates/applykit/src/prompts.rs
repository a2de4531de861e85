//! Prompt templates for the three LLM operations
//!
//! Templates are plain strings with `{placeholder}` slots. Each one states
//! the expected JSON output shape inline and ends with a "Return ONLY valid
//! JSON" instruction, which keeps the extraction strategies in `llm` honest.

use std::collections::HashMap;
use std::fmt;

/// The three operations ApplyKit asks an LLM to perform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptKind {
    /// Page content → structured program facts
    InfoExtraction,
    /// Form page content → ordered question list
    QuestionExtraction,
    /// Program facts + questions → answers
    AnswerGeneration,
}

impl PromptKind {
    /// Stable name used for logging and cache keys
    pub fn name(&self) -> &'static str {
        match self {
            PromptKind::InfoExtraction => "info_extraction",
            PromptKind::QuestionExtraction => "question_extraction",
            PromptKind::AnswerGeneration => "answer_generation",
        }
    }
}

impl fmt::Display for PromptKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Variables substituted into a template
#[derive(Debug, Clone, Default)]
pub struct PromptVars {
    /// Application/program name
    pub app_name: String,
    /// Prepared page content
    pub content: String,
    /// Extracted program facts as JSON text
    pub info: String,
    /// Extracted question list as JSON text
    pub questions: String,
}

const INFO_EXTRACTION_TEMPLATE: &str = "\
You are an expert at analyzing web pages about applications, programs, and opportunities.

Extract structured information from this page content about {app_name}.
Focus on: program name, description, eligibility requirements, deadlines and \
other important dates, benefits, application process, required documents, and \
contact information. Extract factual information as presented on the page; \
keep dates and amounts verbatim.

Return a JSON object with clear keys and values, for example: name, \
description, eligibility, deadlines, benefits, contact.

Page content:
{content}

Return ONLY valid JSON, no other text.";

const QUESTION_EXTRACTION_TEMPLATE: &str = "\
You are an expert at analyzing HTML forms and finding every element that \
requires user input.

Extract ALL form questions from this page for {app_name}. Look for input \
fields, textareas, select dropdowns, radio buttons, checkboxes, file uploads, \
and their labels. Use the question text as users would see it, not field names. \
Keep the questions in the order they appear on the page.

Return a JSON object with a \"questions\" array where each item has:
- text: the question or label text
- type: text|textarea|select|radio|checkbox|email|date|number|file|url
- required: boolean
- options: array of choices (for select/radio/checkbox, else empty)
- field_name: HTML name/id attribute if available
- help_text: helper text or instructions if any

Page content:
{content}

Return ONLY valid JSON, no other text.";

const ANSWER_GENERATION_TEMPLATE: &str = "\
You are an expert at filling out application forms. Generate appropriate, \
professional answers based on the available information. Be honest about what \
is missing: never fabricate specific names, dates, or numbers, and flag \
answers that need user review with lower confidence.

Generate an answer for each question below about {app_name}. Be concise but \
thorough, and tailor answers to the application.

Application information:
{info}

Questions to answer:
{questions}

Return a JSON object with an \"answers\" array where each item has:
- question: the original question text
- answer: your generated answer
- confidence: high|medium|low
- notes: caveats or guidance for the user (optional)

Return ONLY valid JSON, no other text.";

/// Parametrized instruction strings for the three operations.
///
/// Default templates are built in; any of them can be replaced wholesale
/// with [`PromptLibrary::set_template`].
pub struct PromptLibrary {
    templates: HashMap<PromptKind, String>,
}

impl Default for PromptLibrary {
    fn default() -> Self {
        Self::new()
    }
}

impl PromptLibrary {
    /// Library with the built-in templates.
    pub fn new() -> Self {
        let mut templates = HashMap::new();
        templates.insert(PromptKind::InfoExtraction, INFO_EXTRACTION_TEMPLATE.into());
        templates.insert(
            PromptKind::QuestionExtraction,
            QUESTION_EXTRACTION_TEMPLATE.into(),
        );
        templates.insert(
            PromptKind::AnswerGeneration,
            ANSWER_GENERATION_TEMPLATE.into(),
        );
        Self { templates }
    }

    /// Replace the template for one operation.
    pub fn set_template(&mut self, kind: PromptKind, template: impl Into<String>) {
        self.templates.insert(kind, template.into());
    }

    /// Render the template for `kind` with `vars` substituted in.
    pub fn render(&self, kind: PromptKind, vars: &PromptVars) -> String {
        let template = self
            .templates
            .get(&kind)
            .expect("library holds a template for every kind");
        template
            .replace("{app_name}", &vars.app_name)
            .replace("{content}", &vars.content)
            .replace("{info}", &vars.info)
            .replace("{questions}", &vars.questions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_substitutes_variables() {
        let lib = PromptLibrary::new();
        let vars = PromptVars {
            app_name: "Acme Grant".into(),
            content: "Deadline: June 1".into(),
            ..Default::default()
        };
        let prompt = lib.render(PromptKind::InfoExtraction, &vars);
        assert!(prompt.contains("Acme Grant"));
        assert!(prompt.contains("Deadline: June 1"));
        assert!(!prompt.contains("{app_name}"));
        assert!(!prompt.contains("{content}"));
    }

    #[test]
    fn test_answer_template_carries_info_and_questions() {
        let lib = PromptLibrary::new();
        let vars = PromptVars {
            app_name: "Acme".into(),
            info: r#"{"name":"Acme"}"#.into(),
            questions: r#"[{"text":"Why?"}]"#.into(),
            ..Default::default()
        };
        let prompt = lib.render(PromptKind::AnswerGeneration, &vars);
        assert!(prompt.contains(r#"{"name":"Acme"}"#));
        assert!(prompt.contains(r#"[{"text":"Why?"}]"#));
    }

    #[test]
    fn test_custom_template_override() {
        let mut lib = PromptLibrary::new();
        lib.set_template(PromptKind::InfoExtraction, "summarize {content}");
        let vars = PromptVars {
            content: "hello".into(),
            ..Default::default()
        };
        assert_eq!(
            lib.render(PromptKind::InfoExtraction, &vars),
            "summarize hello"
        );
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(PromptKind::InfoExtraction.name(), "info_extraction");
        assert_eq!(PromptKind::AnswerGeneration.to_string(), "answer_generation");
    }
}
