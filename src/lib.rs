//! Search Evaluator - compare search engines with an LLM grader.
//!
//! Each query is sent to several search engines; a grading model then
//! scores every engine's result list on configurable dimensions
//! (authority, relevance, freshness, ...) and the per-dimension scores are
//! combined into a weighted total per (query, engine, round).
//!
//! # Quick Start
//!
//! ```no_run
//! use search_evaluator::{
//!     config::Config,
//!     evaluator::{EvaluationRequest, Evaluator, NoopListener},
//!     report,
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load(None)?;
//!     let evaluator = Evaluator::from_config(&config)?;
//!
//!     let request = EvaluationRequest::from_config(&config, vec!["rust async runtime".into()]);
//!     let results = evaluator.run(&request, &NoopListener).await?;
//!
//!     report::print_summary(&results, config.evaluation.scoring_system);
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - **SearchClient**: posts queries to the web search endpoint and normalizes responses
//! - **LlmClient**: OpenAI-compatible chat client, streamed or not
//! - **Scorer**: builds grading prompts and extracts numeric scores
//! - **Evaluator**: fans out searches, sequences scoring, reports progress
//! - **AppState**: in-memory configuration, results and run log

pub mod config;
pub mod error;
pub mod evaluator;
pub mod llm;
pub mod model;
pub mod query;
pub mod report;
pub mod scoring;
pub mod search;
pub mod state;

// Re-export commonly used types
pub use config::Config;
pub use error::{EvalError, Result};
pub use evaluator::{EvaluationListener, EvaluationRequest, Evaluator};
pub use llm::LlmClient;
pub use model::{
    Dimension, EvaluationProgress, EvaluationResult, ScoringSystem, SearchEngine,
    SearchResultItem,
};
pub use scoring::{Scorer, extract_score, weighted_score};
pub use search::SearchClient;
pub use state::AppState;
