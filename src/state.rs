//! Application state shared by the evaluation run and its views.
//!
//! Every mutation goes through a setter on [`AppState`]. [`SharedState`]
//! wraps it for use as an [`EvaluationListener`] while a run is in flight.

use crate::config::Config;
use crate::error::{EvalError, Result};
use crate::evaluator::{EvaluationListener, EvaluationRequest};
use crate::model::{
    Dimension, EvaluationProgress, EvaluationResult, LogEntry, ScoringSystem, SearchEngine,
    SearchResponse,
};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

/// In-memory state of the tool. Nothing here is persisted.
#[derive(Debug, Clone)]
pub struct AppState {
    config: Config,
    results: Vec<EvaluationResult>,
    progress: Option<EvaluationProgress>,
    logs: Vec<LogEntry>,
    /// Latest search response per engine id.
    search_previews: BTreeMap<String, SearchResponse>,
}

impl AppState {
    pub fn from_config(config: Config) -> Self {
        Self {
            config,
            results: Vec::new(),
            progress: None,
            logs: Vec::new(),
            search_previews: BTreeMap::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn engines(&self) -> &[SearchEngine] {
        &self.config.engines
    }

    pub fn dimensions(&self) -> &[Dimension] {
        &self.config.dimensions
    }

    pub fn results(&self) -> &[EvaluationResult] {
        &self.results
    }

    pub fn progress(&self) -> Option<&EvaluationProgress> {
        self.progress.as_ref()
    }

    pub fn logs(&self) -> &[LogEntry] {
        &self.logs
    }

    pub fn search_preview(&self, engine_id: &str) -> Option<&SearchResponse> {
        self.search_previews.get(engine_id)
    }

    /// Build a run request for `queries` from the current selection.
    pub fn evaluation_request(&self, queries: Vec<String>) -> EvaluationRequest {
        EvaluationRequest::from_config(&self.config, queries)
    }

    fn engine_mut(&mut self, id: &str) -> Result<&mut SearchEngine> {
        self.config
            .engines
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| EvalError::InvalidConfig(format!("Unknown engine '{}'", id)))
    }

    fn dimension_mut(&mut self, name: &str) -> Result<&mut Dimension> {
        self.config
            .dimensions
            .iter_mut()
            .find(|d| d.name == name || d.id == name)
            .ok_or_else(|| EvalError::InvalidConfig(format!("Unknown dimension '{}'", name)))
    }

    pub fn add_engine(&mut self, engine: SearchEngine) -> Result<()> {
        if engine.code.trim().is_empty() || engine.id.trim().is_empty() {
            return Err(EvalError::InvalidConfig(
                "Engine id and code must not be empty".to_string(),
            ));
        }
        if self.config.engines.iter().any(|e| e.id == engine.id) {
            return Err(EvalError::InvalidConfig(format!(
                "Engine '{}' already exists",
                engine.id
            )));
        }
        self.config.engines.push(engine);
        Ok(())
    }

    pub fn remove_engine(&mut self, id: &str) -> Result<SearchEngine> {
        let idx = self
            .config
            .engines
            .iter()
            .position(|e| e.id == id)
            .ok_or_else(|| EvalError::InvalidConfig(format!("Unknown engine '{}'", id)))?;
        Ok(self.config.engines.remove(idx))
    }

    pub fn set_engine_enabled(&mut self, id: &str, enabled: bool) -> Result<()> {
        self.engine_mut(id)?.enabled = enabled;
        Ok(())
    }

    /// Enable exactly the engines whose id or code is listed.
    pub fn select_engines(&mut self, selection: &[String]) -> Result<()> {
        for wanted in selection {
            if !self
                .config
                .engines
                .iter()
                .any(|e| &e.id == wanted || &e.code == wanted)
            {
                return Err(EvalError::InvalidConfig(format!(
                    "Unknown engine '{}'",
                    wanted
                )));
            }
        }
        for engine in &mut self.config.engines {
            engine.enabled = selection
                .iter()
                .any(|s| s == &engine.id || s == &engine.code);
        }
        Ok(())
    }

    pub fn add_dimension(&mut self, dimension: Dimension) -> Result<()> {
        if dimension.name.trim().is_empty() {
            return Err(EvalError::InvalidConfig(
                "Dimension name must not be empty".to_string(),
            ));
        }
        if self
            .config
            .dimensions
            .iter()
            .any(|d| d.name == dimension.name || d.id == dimension.id)
        {
            return Err(EvalError::InvalidConfig(format!(
                "Dimension '{}' already exists",
                dimension.name
            )));
        }
        self.config.dimensions.push(Dimension {
            weight: dimension.weight.clamp(0.0, 1.0),
            ..dimension
        });
        Ok(())
    }

    /// Set a dimension's weight, clamped to 0..=1.
    pub fn set_dimension_weight(&mut self, name: &str, weight: f64) -> Result<()> {
        self.dimension_mut(name)?.weight = weight.clamp(0.0, 1.0);
        Ok(())
    }

    pub fn set_dimension_enabled(&mut self, name: &str, enabled: bool) -> Result<()> {
        self.dimension_mut(name)?.enabled = enabled;
        Ok(())
    }

    /// Replace a dimension's grading instruction; `None` restores the built-in one.
    pub fn set_dimension_prompt(&mut self, name: &str, prompt: Option<String>) -> Result<()> {
        self.dimension_mut(name)?.prompt = prompt.filter(|p| !p.trim().is_empty());
        Ok(())
    }

    /// Enable exactly the dimensions whose name or id is listed.
    pub fn select_dimensions(&mut self, selection: &[String]) -> Result<()> {
        for wanted in selection {
            self.dimension_mut(wanted)?;
        }
        for dim in &mut self.config.dimensions {
            dim.enabled = selection.iter().any(|s| s == &dim.name || s == &dim.id);
        }
        Ok(())
    }

    pub fn set_scoring_system(&mut self, system: ScoringSystem) {
        self.config.evaluation.scoring_system = system;
    }

    pub fn set_rounds(&mut self, rounds: u32) -> Result<()> {
        if rounds == 0 {
            return Err(EvalError::InvalidConfig(
                "Round count must be at least 1".to_string(),
            ));
        }
        self.config.evaluation.rounds = rounds;
        Ok(())
    }

    pub fn set_result_count(&mut self, count: usize) -> Result<()> {
        if count == 0 {
            return Err(EvalError::InvalidConfig(
                "Result count must be at least 1".to_string(),
            ));
        }
        self.config.search.count = count;
        Ok(())
    }

    pub fn set_stream(&mut self, stream: bool) {
        self.config.evaluation.stream = stream;
    }

    pub fn push_result(&mut self, result: EvaluationResult) {
        self.results.push(result);
    }

    pub fn set_progress(&mut self, progress: EvaluationProgress) {
        self.progress = Some(progress);
    }

    pub fn push_log(&mut self, entry: LogEntry) {
        self.logs.push(entry);
    }

    pub fn set_search_preview(&mut self, engine_id: &str, response: SearchResponse) {
        self.search_previews.insert(engine_id.to_string(), response);
    }

    /// Drop results, progress, logs and previews from a previous run.
    pub fn clear_results(&mut self) {
        self.results.clear();
        self.progress = None;
        self.logs.clear();
        self.search_previews.clear();
    }
}

/// [`AppState`] behind a lock, updated by run callbacks.
#[derive(Debug)]
pub struct SharedState(Mutex<AppState>);

impl SharedState {
    pub fn new(state: AppState) -> Self {
        Self(Mutex::new(state))
    }

    /// Lock the state for reading or mutation.
    pub fn lock(&self) -> MutexGuard<'_, AppState> {
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn into_inner(self) -> AppState {
        self.0
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl EvaluationListener for SharedState {
    fn on_search_results(&self, _query: &str, engine: &SearchEngine, response: &SearchResponse) {
        self.lock().set_search_preview(&engine.id, response.clone());
    }

    fn on_result(&self, result: &EvaluationResult) {
        self.lock().push_result(result.clone());
    }

    fn on_progress(&self, progress: &EvaluationProgress) {
        self.lock().set_progress(progress.clone());
    }

    fn on_log(&self, entry: &LogEntry) {
        self.lock().push_log(entry.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LogLevel;
    use chrono::Utc;

    fn state() -> AppState {
        AppState::from_config(Config::default())
    }

    #[test]
    fn test_engine_setters() {
        let mut state = state();
        state.set_engine_enabled("bing", false).unwrap();
        assert!(!state.engines().iter().find(|e| e.id == "bing").unwrap().enabled);

        assert!(state.set_engine_enabled("nope", true).is_err());

        state
            .add_engine(SearchEngine::new("custom", "search_custom", "Custom"))
            .unwrap();
        assert!(
            state
                .add_engine(SearchEngine::new("custom", "x", "Dup"))
                .is_err()
        );
        assert_eq!(state.remove_engine("custom").unwrap().code, "search_custom");
        assert!(state.remove_engine("custom").is_err());
    }

    #[test]
    fn test_select_engines_by_id_or_code() {
        let mut state = state();
        state
            .select_engines(&["std".to_string(), "search_pro_quark".to_string()])
            .unwrap();
        let enabled: Vec<_> = state
            .engines()
            .iter()
            .filter(|e| e.enabled)
            .map(|e| e.id.as_str())
            .collect();
        assert_eq!(enabled, vec!["std", "quark"]);

        assert!(state.select_engines(&["missing".to_string()]).is_err());
        // A rejected selection leaves the previous one in place.
        assert_eq!(state.engines().iter().filter(|e| e.enabled).count(), 2);
    }

    #[test]
    fn test_dimension_setters() {
        let mut state = state();
        state.set_dimension_weight("authority", 1.7).unwrap();
        state.set_dimension_enabled("diversity", true).unwrap();
        state
            .set_dimension_prompt("relevance", Some("Custom".to_string()))
            .unwrap();

        let dims = state.dimensions();
        assert_eq!(dims.iter().find(|d| d.name == "authority").unwrap().weight, 1.0);
        assert!(dims.iter().find(|d| d.name == "diversity").unwrap().enabled);
        assert_eq!(
            dims.iter().find(|d| d.name == "relevance").unwrap().prompt.as_deref(),
            Some("Custom")
        );

        state.set_dimension_prompt("relevance", Some("  ".to_string())).unwrap();
        assert!(state.dimensions().iter().find(|d| d.name == "relevance").unwrap().prompt.is_none());

        assert!(state.add_dimension(Dimension::new("authority", "authority", 0.2)).is_err());
        state.add_dimension(Dimension::new("depth", "depth", 2.0)).unwrap();
        assert_eq!(state.dimensions().last().unwrap().weight, 1.0);
    }

    #[test]
    fn test_run_settings() {
        let mut state = state();
        state.set_scoring_system(ScoringSystem::Binary);
        state.set_rounds(3).unwrap();
        assert!(state.set_rounds(0).is_err());
        assert!(state.set_result_count(0).is_err());

        let request = state.evaluation_request(vec!["q".to_string()]);
        assert_eq!(request.rounds, 3);
        assert_eq!(request.scoring_system, ScoringSystem::Binary);
    }

    #[test]
    fn test_shared_state_records_callbacks() {
        let shared = SharedState::new(state());
        let result = EvaluationResult {
            engine_id: "std".to_string(),
            engine_name: "Standard".to_string(),
            query: "q".to_string(),
            round: 1,
            results: Vec::new(),
            scores: BTreeMap::new(),
            weighted_score: 0.0,
            timestamp: Utc::now(),
        };

        shared.on_result(&result);
        shared.on_log(&LogEntry::new(LogLevel::Info, "hello"));
        shared.on_progress(&EvaluationProgress {
            percent: 100,
            complete: true,
            ..Default::default()
        });

        let mut state = shared.into_inner();
        assert_eq!(state.results().len(), 1);
        assert_eq!(state.logs().len(), 1);
        assert!(state.progress().unwrap().complete);

        state.clear_results();
        assert!(state.results().is_empty());
        assert!(state.progress().is_none());
    }
}
