//! Core data types shared by search, scoring and reporting.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// A configured search backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchEngine {
    /// Stable identifier used by the UI and in results.
    pub id: String,
    /// Code sent to the search API as `search_engine`.
    pub code: String,
    /// Display name.
    pub name: String,
    /// Whether the engine takes part in the next run.
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl SearchEngine {
    pub fn new(id: impl Into<String>, code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            code: code.into(),
            name: name.into(),
            enabled: true,
        }
    }
}

/// An evaluation axis such as authority or freshness.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dimension {
    pub id: String,
    pub name: String,
    /// Relative weight in 0..=1. Weights need not sum to 1.
    pub weight: f64,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Custom grading instruction; the built-in template is used when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
}

impl Dimension {
    pub fn new(id: impl Into<String>, name: impl Into<String>, weight: f64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            weight,
            enabled: true,
            prompt: None,
        }
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

fn default_true() -> bool {
    true
}

/// The numeric convention the grader is asked to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScoringSystem {
    /// Two levels: 0 (fails the dimension) or 1 (meets it).
    Binary,
    /// Five-point scale from 1 to 5.
    #[default]
    FivePoint,
}

impl ScoringSystem {
    pub fn min(self) -> f64 {
        match self {
            ScoringSystem::Binary => 0.0,
            ScoringSystem::FivePoint => 1.0,
        }
    }

    pub fn max(self) -> f64 {
        match self {
            ScoringSystem::Binary => 1.0,
            ScoringSystem::FivePoint => 5.0,
        }
    }

    /// Scale description embedded in grading prompts.
    pub fn describe(self) -> &'static str {
        match self {
            ScoringSystem::Binary => {
                "Use a two-level scale: 1 if the results meet the criterion, 0 if they do not."
            }
            ScoringSystem::FivePoint => {
                "Use a five-point scale from 1 (very poor) to 5 (excellent). Half points such as 3.5 are allowed."
            }
        }
    }
}

impl fmt::Display for ScoringSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScoringSystem::Binary => write!(f, "binary"),
            ScoringSystem::FivePoint => write!(f, "five-point"),
        }
    }
}

impl FromStr for ScoringSystem {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "binary" | "two" | "two-level" | "2" => Ok(ScoringSystem::Binary),
            "five" | "five-point" | "five-level" | "5" => Ok(ScoringSystem::FivePoint),
            other => Err(format!(
                "unknown scoring system '{}', expected 'binary' or 'five-point'",
                other
            )),
        }
    }
}

/// One entry of a normalized search result list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResultItem {
    pub title: String,
    pub url: String,
    pub snippet: String,
    /// 1-based position in the engine's list.
    pub rank: usize,
}

/// Normalized search response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<SearchResultItem>,
    pub total_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

/// Outcome of grading one engine's results for one query in one round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub engine_id: String,
    pub engine_name: String,
    pub query: String,
    pub round: u32,
    pub results: Vec<SearchResultItem>,
    /// Per-dimension scores keyed by dimension name.
    pub scores: BTreeMap<String, f64>,
    pub weighted_score: f64,
    pub timestamp: DateTime<Utc>,
}

/// Snapshot of a running evaluation. Overwritten on every update.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EvaluationProgress {
    pub query: String,
    pub current_engine: String,
    pub current_round: u32,
    pub total_rounds: u32,
    /// Engine x round combinations finished so far.
    pub completed: usize,
    /// Engine x round combinations planned across all queries.
    pub total: usize,
    pub percent: u8,
    pub complete: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

/// A line in the live run log.
#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
}

impl LogEntry {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            message: message.into(),
        }
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.level {
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        };
        write!(
            f,
            "[{}] {:<5} {}",
            self.timestamp.format("%H:%M:%S"),
            level,
            self.message
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scoring_system_parsing() {
        assert_eq!("binary".parse::<ScoringSystem>(), Ok(ScoringSystem::Binary));
        assert_eq!("2".parse::<ScoringSystem>(), Ok(ScoringSystem::Binary));
        assert_eq!(
            "Five-Point".parse::<ScoringSystem>(),
            Ok(ScoringSystem::FivePoint)
        );
        assert!("ten".parse::<ScoringSystem>().is_err());
    }

    #[test]
    fn test_scoring_system_range() {
        assert_eq!(ScoringSystem::Binary.max(), 1.0);
        assert_eq!(ScoringSystem::FivePoint.min(), 1.0);
        assert_eq!(ScoringSystem::FivePoint.max(), 5.0);
    }

    #[test]
    fn test_dimension_yaml_defaults() {
        let dim: Dimension = serde_yaml::from_str("id: auth\nname: authority\nweight: 0.4\n").unwrap();
        assert!(dim.enabled);
        assert!(dim.prompt.is_none());
        assert_eq!(dim.weight, 0.4);
    }

    #[test]
    fn test_scoring_system_serde_names() {
        let json = serde_json::to_string(&ScoringSystem::FivePoint).unwrap();
        assert_eq!(json, "\"five-point\"");
        let parsed: ScoringSystem = serde_json::from_str("\"binary\"").unwrap();
        assert_eq!(parsed, ScoringSystem::Binary);
    }
}
