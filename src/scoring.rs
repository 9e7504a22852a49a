//! Grading one result list on one dimension, and combining dimension scores.

use crate::error::{EvalError, Result};
use crate::llm::{ChunkObserver, LlmClient, Prompts, build_grading_prompt};
use crate::model::{Dimension, ScoringSystem, SearchResultItem};
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;
use tracing::debug;

static LABELED_SCORE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:最终得分|final\s*score)\s*[:：]?\s*(\d+(?:\.\d+)?)")
        .expect("labeled score pattern is valid")
});

static BARE_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+(?:\.\d+)?").expect("number pattern is valid"));

/// Pull a numeric score out of free-form grader output.
///
/// When the label `Final score: N` (or `最终得分：N`) occurs more than once,
/// the LAST occurrence wins, not the first: graders often quote an interim
/// score while reasoning and close with the final one. Without a label the
/// first number anywhere in the text is used; otherwise 0. The value is not
/// checked against the scoring range.
pub fn extract_score(text: &str) -> f64 {
    let labeled = LABELED_SCORE
        .captures_iter(text)
        .last()
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok());

    if let Some(score) = labeled {
        return score;
    }

    BARE_NUMBER
        .find(text)
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .unwrap_or(0.0)
}

/// Weighted mean of `scores` over the dimensions that have a score.
///
/// Dimensions missing from `scores` contribute to neither the numerator
/// nor the denominator. Returns 0 when no dimension is present.
pub fn weighted_score(scores: &BTreeMap<String, f64>, dimensions: &[Dimension]) -> f64 {
    let (weighted_sum, total_weight) = dimensions
        .iter()
        .filter_map(|dim| scores.get(&dim.name).map(|score| (score, dim.weight)))
        .fold((0.0, 0.0), |(sum, weights), (score, weight)| {
            (sum + score * weight, weights + weight)
        });

    if total_weight > 0.0 {
        weighted_sum / total_weight
    } else {
        0.0
    }
}

/// A graded dimension.
#[derive(Debug, Clone)]
pub struct DimensionScore {
    pub score: f64,
    /// The grader's full answer.
    pub answer: String,
}

/// Grades search results through the scoring model.
#[derive(Clone)]
pub struct Scorer {
    client: LlmClient,
    stream: bool,
}

impl Scorer {
    /// Create a new scorer; `stream` selects streamed grader responses.
    pub fn new(client: LlmClient, stream: bool) -> Self {
        Self { client, stream }
    }

    /// Grade `results` for `query` on a single dimension.
    pub async fn score(
        &self,
        query: &str,
        results: &[SearchResultItem],
        dimension: &Dimension,
        system: ScoringSystem,
        observer: Option<&ChunkObserver<'_>>,
    ) -> Result<DimensionScore> {
        if results.is_empty() {
            return Err(EvalError::EmptyResults);
        }

        let prompt = build_grading_prompt(query, results, dimension, system);
        let answer = self
            .client
            .complete(Some(Prompts::system_grader()), &prompt, self.stream, observer)
            .await?;

        let score = extract_score(&answer);
        debug!(dimension = %dimension.name, score, "Graded dimension");

        Ok(DimensionScore { score, answer })
    }
}
