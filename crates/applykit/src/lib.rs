//! ApplyKit - LLM-assisted application form processing
//!
//! This crate is the core of ApplyKit: scrape an information page and a
//! form page, ask an LLM to extract structured data from each, then ask
//! it to draft answers, and persist the aggregate.
//!
//! ## Pipeline
//!
//! The [`Processor`] fans out two branches per application:
//!
//! - info branch: [`Scraper`] fetch → info extraction call
//! - form branch: [`Scraper`] fetch → question extraction call
//!
//! Branches run concurrently and fail independently; whatever survives
//! feeds answer generation. Every failure becomes data in the final
//! [`ProcessingResult`] rather than aborting the run.
//!
//! The LLM side is pluggable via the [`LlmProvider`] trait; the built-in
//! [`ChatCompletionsProvider`] speaks the OpenAI-compatible protocol.

pub mod cache;
pub mod config;
mod error;
pub mod llm;
pub mod processor;
pub mod prompts;
pub mod scrape;
pub mod store;
mod types;
pub mod validate;

pub use cache::TtlCache;
pub use config::Config;
pub use error::{ApplyError, Result};
pub use llm::{ChatCompletionsProvider, LlmClient, LlmOutcome, LlmProvider};
pub use processor::{ProcessRequest, Processor};
pub use prompts::{PromptKind, PromptLibrary, PromptVars};
pub use scrape::{ScrapeOptions, Scraper};
pub use store::{ResultStore, StoredResultSummary};
pub use types::{
    Answer, ApplicationInfo, Confidence, ProcessingError, ProcessingResult, ProcessingStatus,
    Question, QuestionKind, ScrapeResult, Stage,
};
pub use validate::validate_url;

/// Default User-Agent string
pub const DEFAULT_USER_AGENT: &str = "ApplyKit/0.1";

/// Build a fully wired [`Processor`] from configuration.
pub fn processor_from_config(config: &Config) -> Result<Processor> {
    let scraper = Scraper::new(
        ScrapeOptions {
            timeout: config.scrape_timeout,
            max_content_chars: config.max_content_chars,
            use_cache: config.use_cache,
            ..ScrapeOptions::default()
        },
        config.cache_ttl,
    );

    let provider = ChatCompletionsProvider::new(
        &config.llm_base_url,
        &config.llm_api_key,
        &config.llm_model,
        config.llm_timeout,
    )?;

    let mut llm = LlmClient::new(std::sync::Arc::new(provider));
    if config.use_cache {
        llm = llm.with_cache(config.cache_ttl);
    }

    Ok(Processor::new(scraper, llm).with_store(ResultStore::new(&config.output_dir)))
}
