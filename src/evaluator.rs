//! Batch evaluation across queries, engines, rounds and dimensions.
//!
//! For each query every enabled engine is searched concurrently. Each
//! engine that returned results is then graded round by round, one
//! dimension at a time, with a fixed pause between scoring calls. Failures
//! below the run boundary are logged and never abort the batch.

use crate::config::Config;
use crate::error::{EvalError, Result};
use crate::llm::{ChunkObserver, LlmClient};
use crate::model::{
    Dimension, EvaluationProgress, EvaluationResult, LogEntry, LogLevel, ScoringSystem,
    SearchEngine, SearchResponse,
};
use crate::scoring::{Scorer, weighted_score};
use crate::search::SearchClient;
use chrono::Utc;
use futures::future::join_all;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{error, info, warn};

/// Default pause between consecutive scoring calls.
pub const DEFAULT_SCORING_DELAY: Duration = Duration::from_millis(1000);

/// Callbacks fired while a batch runs. All methods default to no-ops.
pub trait EvaluationListener: Send + Sync {
    /// An engine's search call finished, before any grading starts.
    fn on_search_results(&self, _query: &str, _engine: &SearchEngine, _response: &SearchResponse) {
    }

    /// A (query, engine, round) evaluation was appended.
    fn on_result(&self, _result: &EvaluationResult) {}

    fn on_progress(&self, _progress: &EvaluationProgress) {}

    /// Raw chunk of a streamed grader response.
    fn on_stream_chunk(&self, _chunk: &str) {}

    /// One dimension was graded (0 when scoring failed). Ends any streamed answer.
    fn on_dimension_scored(
        &self,
        _engine: &SearchEngine,
        _dimension: &Dimension,
        _round: u32,
        _score: f64,
    ) {
    }

    fn on_log(&self, _entry: &LogEntry) {}
}

/// Listener that ignores every event.
pub struct NoopListener;

impl EvaluationListener for NoopListener {}

/// What to evaluate in one batch.
#[derive(Debug, Clone)]
pub struct EvaluationRequest {
    pub queries: Vec<String>,
    pub engines: Vec<SearchEngine>,
    pub dimensions: Vec<Dimension>,
    pub rounds: u32,
    pub scoring_system: ScoringSystem,
    /// Results requested from each engine.
    pub result_count: usize,
}

impl EvaluationRequest {
    /// Build a request from the configured engines, dimensions and settings.
    pub fn from_config(config: &Config, queries: Vec<String>) -> Self {
        Self {
            queries,
            engines: config.engines.clone(),
            dimensions: config.dimensions.clone(),
            rounds: config.evaluation.rounds,
            scoring_system: config.evaluation.scoring_system,
            result_count: config.search.count,
        }
    }

    pub fn enabled_engines(&self) -> Vec<&SearchEngine> {
        self.engines.iter().filter(|e| e.enabled).collect()
    }

    pub fn enabled_dimensions(&self) -> Vec<Dimension> {
        self.dimensions.iter().filter(|d| d.enabled).cloned().collect()
    }

    /// Queries with surrounding whitespace removed; blank entries dropped.
    pub fn active_queries(&self) -> Vec<&str> {
        self.queries
            .iter()
            .map(|q| q.trim())
            .filter(|q| !q.is_empty())
            .collect()
    }

    /// Number of (query, engine, round) combinations the run will go through.
    pub fn planned_evaluations(&self) -> usize {
        self.active_queries().len() * self.enabled_engines().len() * self.rounds as usize
    }

    /// Reject requests that cannot produce any evaluation.
    pub fn validate(&self) -> Result<()> {
        if self.active_queries().is_empty() {
            return Err(EvalError::InvalidConfig(
                "Enter at least one query".to_string(),
            ));
        }
        if self.enabled_engines().is_empty() {
            return Err(EvalError::InvalidConfig(
                "Select at least one search engine".to_string(),
            ));
        }
        if self.enabled_dimensions().is_empty() {
            return Err(EvalError::InvalidConfig(
                "Enable at least one evaluation dimension".to_string(),
            ));
        }
        if self.rounds == 0 {
            return Err(EvalError::InvalidConfig(
                "Round count must be at least 1".to_string(),
            ));
        }
        if self.result_count == 0 {
            return Err(EvalError::InvalidConfig(
                "Result count must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Runs batch evaluations against the search and scoring endpoints.
pub struct Evaluator {
    search: SearchClient,
    scorer: Scorer,
    delay: Duration,
}

impl Evaluator {
    pub fn new(search: SearchClient, scorer: Scorer) -> Self {
        Self {
            search,
            scorer,
            delay: DEFAULT_SCORING_DELAY,
        }
    }

    /// Build an evaluator from validated configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;

        let search = SearchClient::new(&config.api, config.search.clone());
        let scorer = Scorer::new(LlmClient::new(config.api.clone()), config.evaluation.stream);

        Ok(Self::new(search, scorer).with_delay(Duration::from_millis(config.evaluation.delay_ms)))
    }

    /// Set the pause between scoring calls.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Run the batch and return every evaluation produced, in order.
    ///
    /// Only request validation errors are returned; search and scoring
    /// failures are logged through `listener` and the run continues.
    pub async fn run(
        &self,
        request: &EvaluationRequest,
        listener: &dyn EvaluationListener,
    ) -> Result<Vec<EvaluationResult>> {
        request.validate()?;

        let engines = request.enabled_engines();
        let dimensions = request.enabled_dimensions();
        let queries = request.active_queries();

        let rounds = request.rounds as usize;
        let total = queries.len() * engines.len() * rounds;
        let mut completed = 0usize;
        let mut results = Vec::new();
        let mut scoring_started = false;

        emit(
            listener,
            LogLevel::Info,
            format!(
                "Starting evaluation: {} queries x {} engines x {} rounds, {} dimensions ({})",
                queries.len(),
                engines.len(),
                rounds,
                dimensions.len(),
                request.scoring_system
            ),
        );

        let stream_observer: &ChunkObserver<'_> = &|chunk: &str| listener.on_stream_chunk(chunk);

        for query in queries {
            emit(
                listener,
                LogLevel::Info,
                format!("Searching '{}' on {} engines", query, engines.len()),
            );

            let searches = engines.iter().map(|engine| async move {
                let outcome = self
                    .search
                    .search(query, &engine.code, request.result_count)
                    .await;
                if let Ok(response) = &outcome {
                    listener.on_search_results(query, engine, response);
                }
                (*engine, outcome)
            });
            let outcomes = join_all(searches).await;

            for (engine, outcome) in outcomes {
                let response = match outcome {
                    Ok(response) if response.results.is_empty() => {
                        emit(
                            listener,
                            LogLevel::Warn,
                            format!("{} returned no results for '{}'", engine.name, query),
                        );
                        completed += rounds;
                        listener.on_progress(&progress(
                            query,
                            engine,
                            0,
                            request.rounds,
                            completed,
                            total,
                        ));
                        continue;
                    }
                    Ok(response) => response,
                    Err(e) => {
                        emit(
                            listener,
                            LogLevel::Error,
                            format!("Search failed on {} for '{}': {}", engine.name, query, e),
                        );
                        completed += rounds;
                        listener.on_progress(&progress(
                            query,
                            engine,
                            0,
                            request.rounds,
                            completed,
                            total,
                        ));
                        continue;
                    }
                };

                emit(
                    listener,
                    LogLevel::Info,
                    format!(
                        "{} returned {} results for '{}'",
                        engine.name,
                        response.results.len(),
                        query
                    ),
                );

                for round in 1..=request.rounds {
                    let mut scores = BTreeMap::new();

                    for dimension in &dimensions {
                        if scoring_started && !self.delay.is_zero() {
                            tokio::time::sleep(self.delay).await;
                        }
                        scoring_started = true;

                        let score = match self
                            .scorer
                            .score(
                                query,
                                &response.results,
                                dimension,
                                request.scoring_system,
                                Some(stream_observer),
                            )
                            .await
                        {
                            Ok(graded) => graded.score,
                            Err(e) => {
                                emit(
                                    listener,
                                    LogLevel::Error,
                                    format!(
                                        "Scoring {} on {} (round {}) failed: {}",
                                        dimension.name, engine.name, round, e
                                    ),
                                );
                                0.0
                            }
                        };
                        listener.on_dimension_scored(engine, dimension, round, score);
                        scores.insert(dimension.name.clone(), score);
                    }

                    let result = EvaluationResult {
                        engine_id: engine.id.clone(),
                        engine_name: engine.name.clone(),
                        query: query.to_string(),
                        round,
                        results: response.results.clone(),
                        weighted_score: weighted_score(&scores, &dimensions),
                        scores,
                        timestamp: Utc::now(),
                    };

                    emit(
                        listener,
                        LogLevel::Info,
                        format!(
                            "{} round {}/{} for '{}': weighted score {:.2}",
                            engine.name, round, request.rounds, query, result.weighted_score
                        ),
                    );
                    listener.on_result(&result);
                    results.push(result);

                    completed += 1;
                    listener.on_progress(&progress(
                        query,
                        engine,
                        round,
                        request.rounds,
                        completed,
                        total,
                    ));
                }
            }
        }

        emit(
            listener,
            LogLevel::Info,
            format!("Evaluation complete: {} results", results.len()),
        );
        // Nothing may follow the completion event.
        listener.on_progress(&EvaluationProgress {
            total_rounds: request.rounds,
            completed: total,
            total,
            percent: 100,
            complete: true,
            ..Default::default()
        });

        Ok(results)
    }
}

/// Intermediate progress; 100% is reserved for the completion event.
fn progress(
    query: &str,
    engine: &SearchEngine,
    round: u32,
    total_rounds: u32,
    completed: usize,
    total: usize,
) -> EvaluationProgress {
    let percent = if total == 0 {
        0
    } else {
        ((completed * 100) / total).min(99) as u8
    };

    EvaluationProgress {
        query: query.to_string(),
        current_engine: engine.name.clone(),
        current_round: round,
        total_rounds,
        completed,
        total,
        percent,
        complete: false,
    }
}

fn emit(listener: &dyn EvaluationListener, level: LogLevel, message: String) {
    match level {
        LogLevel::Info => info!("{}", message),
        LogLevel::Warn => warn!("{}", message),
        LogLevel::Error => error!("{}", message),
    }
    listener.on_log(&LogEntry::new(level, message));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> EvaluationRequest {
        EvaluationRequest {
            queries: vec!["q1".to_string(), "q2".to_string()],
            engines: vec![
                SearchEngine::new("a", "search_a", "A"),
                SearchEngine::new("b", "search_b", "B"),
            ],
            dimensions: vec![Dimension::new("r", "relevance", 1.0)],
            rounds: 3,
            scoring_system: ScoringSystem::FivePoint,
            result_count: 5,
        }
    }

    #[test]
    fn test_planned_evaluations() {
        let mut req = request();
        assert_eq!(req.planned_evaluations(), 12);
        req.engines[1].enabled = false;
        assert_eq!(req.planned_evaluations(), 6);
    }

    #[test]
    fn test_validate_rejects_empty_inputs() {
        assert!(request().validate().is_ok());

        let mut req = request();
        req.queries = vec!["  ".to_string()];
        assert!(matches!(req.validate(), Err(EvalError::InvalidConfig(_))));

        let mut req = request();
        req.engines.iter_mut().for_each(|e| e.enabled = false);
        assert!(req.validate().is_err());

        let mut req = request();
        req.dimensions[0].enabled = false;
        assert!(req.validate().is_err());

        let mut req = request();
        req.rounds = 0;
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_intermediate_progress_never_reaches_100() {
        let engine = SearchEngine::new("a", "search_a", "A");
        let p = progress("q", &engine, 2, 2, 4, 4);
        assert_eq!(p.percent, 99);
        assert!(!p.complete);

        let p = progress("q", &engine, 1, 2, 1, 4);
        assert_eq!(p.percent, 25);
    }

    #[test]
    fn test_from_config_requires_api_key() {
        let config = Config::default();
        assert!(Evaluator::from_config(&config).is_err());

        let config = Config::with_endpoints("http://s", "http://c", "key");
        assert!(Evaluator::from_config(&config).is_ok());
    }

    #[test]
    fn test_run_rejects_request_before_any_call() {
        let config = Config::with_endpoints("http://s", "http://c", "key");
        let evaluator = Evaluator::from_config(&config).unwrap();
        let mut req = request();
        req.rounds = 0;

        let outcome = tokio_test::block_on(evaluator.run(&req, &NoopListener));
        assert!(matches!(outcome, Err(EvalError::InvalidConfig(_))));
    }
}
