//! Aggregate views over evaluation results.

use crate::error::{EvalError, Result};
use crate::model::{EvaluationResult, ScoringSystem};
use serde::Serialize;
use std::collections::BTreeMap;

/// Per-engine aggregate across all queries and rounds.
#[derive(Debug, Clone, Serialize)]
pub struct EngineSummary {
    pub engine_id: String,
    pub engine_name: String,
    /// Number of (query, round) evaluations.
    pub evaluations: usize,
    pub average_score: f64,
    pub best_score: f64,
    pub worst_score: f64,
    /// Mean score per dimension name.
    pub dimension_averages: BTreeMap<String, f64>,
    /// Mean weighted score per round number, ascending.
    pub round_trend: Vec<(u32, f64)>,
}

/// Mean weighted score of one engine on one query.
#[derive(Debug, Clone, Serialize)]
pub struct QueryBreakdown {
    pub query: String,
    pub engine_name: String,
    pub rounds: usize,
    pub average_score: f64,
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Summarize results per engine, best average first.
pub fn summarize(results: &[EvaluationResult]) -> Vec<EngineSummary> {
    let mut order: Vec<&str> = Vec::new();
    let mut grouped: BTreeMap<&str, Vec<&EvaluationResult>> = BTreeMap::new();
    for result in results {
        if !grouped.contains_key(result.engine_id.as_str()) {
            order.push(&result.engine_id);
        }
        grouped.entry(&result.engine_id).or_default().push(result);
    }

    let mut summaries: Vec<EngineSummary> = order
        .into_iter()
        .map(|engine_id| {
            let group = &grouped[engine_id];
            let totals: Vec<f64> = group.iter().map(|r| r.weighted_score).collect();

            let mut per_dimension: BTreeMap<String, Vec<f64>> = BTreeMap::new();
            let mut per_round: BTreeMap<u32, Vec<f64>> = BTreeMap::new();
            for result in group {
                for (name, score) in &result.scores {
                    per_dimension.entry(name.clone()).or_default().push(*score);
                }
                per_round
                    .entry(result.round)
                    .or_default()
                    .push(result.weighted_score);
            }

            EngineSummary {
                engine_id: engine_id.to_string(),
                engine_name: group[0].engine_name.clone(),
                evaluations: group.len(),
                average_score: mean(&totals),
                best_score: totals.iter().cloned().fold(f64::MIN, f64::max),
                worst_score: totals.iter().cloned().fold(f64::MAX, f64::min),
                dimension_averages: per_dimension
                    .into_iter()
                    .map(|(name, scores)| (name, mean(&scores)))
                    .collect(),
                round_trend: per_round
                    .into_iter()
                    .map(|(round, scores)| (round, mean(&scores)))
                    .collect(),
            }
        })
        .collect();

    summaries.sort_by(|a, b| b.average_score.total_cmp(&a.average_score));
    summaries
}

/// Mean score per (query, engine), in first-seen order.
pub fn breakdown(results: &[EvaluationResult]) -> Vec<QueryBreakdown> {
    let mut rows: Vec<(String, String, Vec<f64>)> = Vec::new();
    for result in results {
        match rows
            .iter_mut()
            .find(|(q, e, _)| q == &result.query && e == &result.engine_name)
        {
            Some((_, _, scores)) => scores.push(result.weighted_score),
            None => rows.push((
                result.query.clone(),
                result.engine_name.clone(),
                vec![result.weighted_score],
            )),
        }
    }

    rows.into_iter()
        .map(|(query, engine_name, scores)| QueryBreakdown {
            query,
            engine_name,
            rounds: scores.len(),
            average_score: mean(&scores),
        })
        .collect()
}

/// Serialize results and summaries for machine consumption.
pub fn to_json(results: &[EvaluationResult]) -> Result<String> {
    #[derive(Serialize)]
    struct Report<'a> {
        summary: Vec<EngineSummary>,
        queries: Vec<QueryBreakdown>,
        results: &'a [EvaluationResult],
    }

    serde_json::to_string_pretty(&Report {
        summary: summarize(results),
        queries: breakdown(results),
        results,
    })
    .map_err(|e| EvalError::Serialization(e.to_string()))
}

/// Print the per-engine summary, trend and per-query tables.
pub fn print_summary(results: &[EvaluationResult], system: ScoringSystem) {
    let summaries = summarize(results);

    println!("\n========== Evaluation Summary ==========");
    if summaries.is_empty() {
        println!("No evaluations were produced.");
        println!("========================================\n");
        return;
    }

    println!("Scoring system: {} ({})", system, scale_label(system));
    println!("----------------------------------------");
    for (rank, summary) in summaries.iter().enumerate() {
        println!(
            "{:>2}. {:<12} avg {:.2}/{}  (best {:.2}, worst {:.2}, n={})",
            rank + 1,
            summary.engine_name,
            summary.average_score,
            system.max(),
            summary.best_score,
            summary.worst_score,
            summary.evaluations
        );
        for (name, avg) in &summary.dimension_averages {
            println!("      {:<14} {:.2}", name, avg);
        }
        if summary.round_trend.len() > 1 {
            let trend = summary
                .round_trend
                .iter()
                .map(|(round, avg)| format!("r{}={:.2}", round, avg))
                .collect::<Vec<_>>()
                .join("  ");
            println!("      trend          {}", trend);
        }
    }

    let rows = breakdown(results);
    if rows.len() > summaries.len() {
        println!("----------------------------------------");
        for row in rows {
            println!(
                "{:<30} {:<12} {:.2} ({} rounds)",
                truncate(&row.query, 30),
                row.engine_name,
                row.average_score,
                row.rounds
            );
        }
    }
    println!("========================================\n");
}

/// Print the result panel of every evaluation's first round.
pub fn print_results(results: &[EvaluationResult], limit: usize) {
    for result in results.iter().filter(|r| r.round == 1) {
        println!("{}", "─".repeat(60));
        println!("{} | {}", result.engine_name, result.query);
        for item in result.results.iter().take(limit) {
            println!("{:>3}. {}", item.rank, item.title);
            println!("     {}", item.url);
            if !item.snippet.is_empty() {
                println!("     {}", truncate(&item.snippet, 120));
            }
        }
        if result.results.len() > limit {
            println!("     ... {} more", result.results.len() - limit);
        }
    }
    if !results.is_empty() {
        println!("{}", "─".repeat(60));
    }
}

/// Range of the scoring system, e.g. `0-1` or `1-5`.
fn scale_label(system: ScoringSystem) -> String {
    format!("{}-{}", system.min(), system.max())
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max_chars.saturating_sub(1)).collect();
        format!("{}…", cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn result(engine: &str, query: &str, round: u32, scores: &[(&str, f64)], total: f64) -> EvaluationResult {
        EvaluationResult {
            engine_id: engine.to_lowercase(),
            engine_name: engine.to_string(),
            query: query.to_string(),
            round,
            results: Vec::new(),
            scores: scores.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
            weighted_score: total,
            timestamp: Utc::now(),
        }
    }

    fn sample() -> Vec<EvaluationResult> {
        vec![
            result("Std", "q1", 1, &[("relevance", 3.0), ("authority", 2.0)], 2.5),
            result("Std", "q1", 2, &[("relevance", 4.0), ("authority", 3.0)], 3.5),
            result("Pro", "q1", 1, &[("relevance", 5.0), ("authority", 4.0)], 4.5),
            result("Pro", "q2", 1, &[("relevance", 4.0), ("authority", 4.0)], 4.0),
        ]
    }

    #[test]
    fn test_summarize_orders_by_average() {
        let summaries = summarize(&sample());
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].engine_name, "Pro");
        assert!((summaries[0].average_score - 4.25).abs() < 1e-9);
        assert_eq!(summaries[0].best_score, 4.5);
        assert_eq!(summaries[0].worst_score, 4.0);

        let std = &summaries[1];
        assert_eq!(std.evaluations, 2);
        assert!((std.dimension_averages["relevance"] - 3.5).abs() < 1e-9);
        assert_eq!(std.round_trend, vec![(1, 2.5), (2, 3.5)]);
    }

    #[test]
    fn test_breakdown_per_query_and_engine() {
        let rows = breakdown(&sample());
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].query, "q1");
        assert_eq!(rows[0].engine_name, "Std");
        assert_eq!(rows[0].rounds, 2);
        assert!((rows[0].average_score - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_results() {
        assert!(summarize(&[]).is_empty());
        assert!(breakdown(&[]).is_empty());
    }

    #[test]
    fn test_to_json_contains_sections() {
        let json = to_json(&sample()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["summary"].as_array().unwrap().len(), 2);
        assert_eq!(value["results"].as_array().unwrap().len(), 4);
        assert_eq!(value["queries"][0]["query"], "q1");
    }

    #[test]
    fn test_scale_label_spans_min_to_max() {
        assert_eq!(scale_label(ScoringSystem::Binary), "0-1");
        assert_eq!(scale_label(ScoringSystem::FivePoint), "1-5");
    }

    #[test]
    fn test_truncate_counts_characters() {
        assert_eq!(truncate("短文本", 10), "短文本");
        assert_eq!(truncate("abcdefgh", 5), "abcd…");
    }
}
