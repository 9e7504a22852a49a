//! Grading prompts.
//!
//! Each built-in dimension has one instruction per scoring system. A
//! dimension's custom prompt replaces the built-in instruction but the
//! surrounding grading template (query, results, scale, answer format)
//! is always applied.

use crate::model::{Dimension, ScoringSystem, SearchResultItem};

/// Collection of prompts used for grading search results.
pub struct Prompts;

impl Prompts {
    /// System prompt for the grader.
    pub fn system_grader() -> &'static str {
        "You are a meticulous search quality rater. You judge a search engine's result list for a single query on one dimension at a time and always finish with the requested score line."
    }

    /// Full grading prompt template.
    pub fn grading() -> &'static str {
        r#"Evaluate the following search results for the query on the dimension "{dimension}".

Query: {query}

Search results:
{results}

Evaluation criteria:
{criteria}

Scoring scale:
{scale}

Briefly explain your reasoning, then end your reply with a single line in exactly this format:
Final score: <number>"#
    }

    /// Built-in instruction for a dimension under a given scoring system.
    pub fn dimension_template(name: &str, system: ScoringSystem) -> Option<&'static str> {
        let template = match (name.trim().to_lowercase().as_str(), system) {
            ("authority", ScoringSystem::Binary) => {
                "Do the results come mainly from authoritative sources (official sites, reputable media, recognised experts)? Score 1 if most of the top results are authoritative, otherwise 0."
            }
            ("authority", ScoringSystem::FivePoint) => {
                "Judge how authoritative the sources are. 5: nearly all results come from official, academic or highly reputable sources. 3: a mix of reputable and unknown sources. 1: mostly content farms, forums or unverifiable sites."
            }
            ("relevance", ScoringSystem::Binary) => {
                "Do the results directly address the query intent? Score 1 if the top results answer or clearly relate to the query, otherwise 0."
            }
            ("relevance", ScoringSystem::FivePoint) => {
                "Judge how well the results match the query intent. 5: the top results directly answer the query. 3: results are on topic but only partially useful. 1: results are largely off topic."
            }
            ("freshness", ScoringSystem::Binary) => {
                "Are the results up to date for this query? Score 1 if the information is current enough for the query, otherwise 0."
            }
            ("freshness", ScoringSystem::FivePoint) => {
                "Judge how current the results are relative to what the query needs. 5: recent, up-to-date information throughout. 3: some results are dated. 1: mostly stale or obsolete information."
            }
            ("completeness", ScoringSystem::Binary) => {
                "Taken together, do the results cover the main aspects of the query? Score 1 if they do, otherwise 0."
            }
            ("completeness", ScoringSystem::FivePoint) => {
                "Judge how completely the result list covers the aspects of the query. 5: all key aspects covered. 3: major gaps remain. 1: only a narrow fragment is covered."
            }
            ("diversity", ScoringSystem::Binary) => {
                "Do the results offer a variety of sources and perspectives rather than near-duplicates? Score 1 if they do, otherwise 0."
            }
            ("diversity", ScoringSystem::FivePoint) => {
                "Judge the variety of sources and perspectives. 5: many distinct, complementary sources. 3: some repetition. 1: near-duplicate results from one or two sites."
            }
            _ => return None,
        };
        Some(template)
    }

    /// Instruction used for dimensions without a template or custom prompt.
    pub fn generic_dimension() -> &'static str {
        "Judge the overall quality of the results with respect to {dimension} for this query."
    }
}

/// Render results as a numbered list for the grader.
pub fn format_results(results: &[SearchResultItem]) -> String {
    results
        .iter()
        .map(|item| {
            format!(
                "[{}] {}\nURL: {}\nSnippet: {}",
                item.rank, item.title, item.url, item.snippet
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Grading instruction for `dimension`: custom prompt, template, or generic.
pub fn dimension_criteria(dimension: &Dimension, system: ScoringSystem) -> String {
    if let Some(prompt) = dimension.prompt.as_deref().filter(|p| !p.trim().is_empty()) {
        return prompt.to_string();
    }
    Prompts::dimension_template(&dimension.name, system)
        .map(str::to_string)
        .unwrap_or_else(|| Prompts::generic_dimension().replace("{dimension}", &dimension.name))
}

/// Build the complete grading prompt for one dimension.
pub fn build_grading_prompt(
    query: &str,
    results: &[SearchResultItem],
    dimension: &Dimension,
    system: ScoringSystem,
) -> String {
    Prompts::grading()
        .replace("{dimension}", &dimension.name)
        .replace("{query}", query)
        .replace("{results}", &format_results(results))
        .replace("{criteria}", &dimension_criteria(dimension, system))
        .replace("{scale}", system.describe())
}
