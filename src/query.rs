//! Batch query input.

use crate::error::{EvalError, Result};
use std::path::Path;

/// Split a multi-line batch input into queries.
///
/// Each line is trimmed; blank lines are dropped.
pub fn parse_queries(input: &str) -> Vec<String> {
    input
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Read a batch query file, one query per line.
pub fn load_queries_file(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path).map_err(|e| EvalError::io(path, e))?;
    Ok(parse_queries(&content))
}
