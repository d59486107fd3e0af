use anyhow::Result;
use serde::Serialize;

use passagedb_core::types::FusedResult;
use passagedb_hybrid::SearchRequest;

#[derive(Serialize)]
struct JsonOutput<'a> {
    query: &'a str,
    mode: String,
    table: &'a str,
    top_k: usize,
    results: &'a [FusedResult],
}

pub fn format_json(request: &SearchRequest, results: &[FusedResult]) -> Result<String> {
    let out = JsonOutput {
        query: &request.query,
        mode: request.mode.to_string(),
        table: request.table.as_str(),
        top_k: request.top_k,
        results,
    };
    Ok(serde_json::to_string_pretty(&out)?)
}

/// One `ID` / `Content` / `Score` block per result.
pub fn format_human(results: &[FusedResult]) -> String {
    if results.is_empty() {
        return "No results.".to_string();
    }
    results
        .iter()
        .map(|r| format!("ID: {}\nContent: {}\nScore: {:.6}\n", r.id, r.content.trim(), r.combined_score))
        .collect::<Vec<_>>()
        .join("----------------------------------------\n")
}
