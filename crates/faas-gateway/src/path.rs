//! Path grammar and reverse-proxy rewrite for the execute endpoint:
//! `/v1/api/execute/{id}[/{rest...}][?query]` (§4.5).

use faas_common::{FaasError, Result};

/// `external_id` and the rewritten forward path, parsed from the raw
/// request path (without query string).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedPath {
    pub external_id: String,
    pub forward_path: String,
}

/// Parses `path` (e.g. `/v1/api/execute/abc/getUser`) into the function id
/// (the 4th segment) and the forward path (everything after it, collapsed
/// to `/` when empty). Fewer than 4 segments is a `Validation` failure.
pub fn parse(path: &str) -> Result<ParsedPath> {
    let segments: Vec<&str> = path.split('/').collect();

    // A leading `/` produces an empty first segment, so `{id}` sits at
    // index 4 of the split (segments[0] == "").
    if segments.len() < 5 || segments[4].is_empty() {
        return Err(FaasError::Validation(format!(
            "path does not match /v1/api/execute/{{id}}/...: {path}"
        )));
    }

    let external_id = segments[4].to_string();
    let rest = &segments[5..];
    let forward_path = if rest.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", rest.join("/"))
    };

    Ok(ParsedPath {
        external_id,
        forward_path,
    })
}

/// Builds the full forward path (including a preserved, non-empty query
/// string) from the already-split path and a raw query string.
pub fn forward_path_with_query(forward_path: &str, raw_query: Option<&str>) -> String {
    match raw_query {
        Some(q) if !q.is_empty() => format!("{forward_path}?{q}"),
        _ => forward_path.to_string(),
    }
}
