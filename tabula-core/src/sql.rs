//! Row limits for outgoing SQL and row extraction from SQL responses.

use log::warn;

/// Keys checked, in order, for a row array inside a SQL response object.
pub const ROW_CONTAINER_KEYS: [&str; 4] = ["rows", "results", "data", "records"];

/// Whether `query` already mentions `limit`, ignoring case.
#[must_use]
pub fn has_limit(query: &str) -> bool {
    query.to_ascii_lowercase().contains("limit")
}

/// Append `LIMIT {limit}` to `query` unless it already has one.
///
/// The query is trimmed first. A trailing semicolon stays at the end.
///
/// # Examples
/// ```
/// use tabula_core::sql::inject_limit;
///
/// assert_eq!(inject_limit("SELECT * FROM t;", 10), "SELECT * FROM t LIMIT 10;");
/// assert_eq!(inject_limit("select * from t limit 5", 10), "select * from t limit 5");
/// ```
#[must_use]
pub fn inject_limit(query: &str, limit: usize) -> String {
    if has_limit(query) {
        return query.to_owned();
    }
    let trimmed = query.trim();
    match trimmed.strip_suffix(';') {
        Some(body) => format!("{} LIMIT {limit};", body.trim_end()),
        None => format!("{trimmed} LIMIT {limit}"),
    }
}

/// Pull the result rows out of a SQL endpoint response.
///
/// A bare array is used as is. An object holding an array under one of
/// [`ROW_CONTAINER_KEYS`] yields that array. Any other object containing at
/// least one scalar is treated as a single row. Everything else yields no
/// rows.
#[must_use]
pub fn extract_rows(response: serde_json::Value) -> Vec<serde_json::Value> {
    let mut object = match response {
        serde_json::Value::Array(rows) => return rows,
        serde_json::Value::Object(object) => object,
        other => {
            warn!("SQL response is not an array or object ({}); no rows extracted", kind_of(&other));
            return Vec::new();
        }
    };

    for key in ROW_CONTAINER_KEYS {
        if matches!(object.get(key), Some(serde_json::Value::Array(_))) {
            if let Some(serde_json::Value::Array(rows)) = object.remove(key) {
                return rows;
            }
        }
    }

    if object
        .values()
        .any(|value| !(value.is_object() || value.is_array()))
    {
        return vec![serde_json::Value::Object(object)];
    }

    warn!("could not locate rows in SQL response; no rows extracted");
    Vec::new()
}

const fn kind_of(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case("SELECT * FROM t", 100, "SELECT * FROM t LIMIT 100")]
    #[case("  SELECT * FROM t ;  ", 5, "SELECT * FROM t LIMIT 5;")]
    #[case("SELECT * FROM t LiMiT 3", 100, "SELECT * FROM t LiMiT 3")]
    #[case("SELECT limited FROM t", 100, "SELECT limited FROM t")]
    fn injects_limits(#[case] query: &str, #[case] limit: usize, #[case] expected: &str) {
        assert_eq!(inject_limit(query, limit), expected);
    }

    #[rstest]
    fn injected_limit_appears_once() {
        let rewritten = inject_limit("SELECT id FROM events;", 7);
        assert_eq!(rewritten.matches("LIMIT").count(), 1);
        assert!(rewritten.ends_with("LIMIT 7;"));
    }

    #[rstest]
    #[case(json!([{"a": 1}]), 1)]
    #[case(json!({"rows": [{"a": 1}, {"a": 2}]}), 2)]
    #[case(json!({"results": [{"a": 1}]}), 1)]
    #[case(json!({"data": [], "records": [{"a": 1}]}), 0)]
    #[case(json!({"records": [{"a": 1}, {"a": 2}, {"a": 3}]}), 3)]
    #[case(json!({"count": 3}), 1)]
    #[case(json!({"nested": {"a": 1}}), 0)]
    #[case(json!("oops"), 0)]
    fn extracts_rows(#[case] response: serde_json::Value, #[case] expected: usize) {
        assert_eq!(extract_rows(response).len(), expected);
    }

    #[rstest]
    fn container_keys_are_checked_in_order() {
        let rows = extract_rows(json!({"results": [{"from": "results"}], "rows": [{"from": "rows"}]}));
        assert_eq!(rows, vec![json!({"from": "rows"})]);
    }
}
