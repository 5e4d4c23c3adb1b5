//! Bracket-depth check run on raw JSON before it is decoded.
//!
//! Decoding into `serde_json::Value` recurses once per level, so documents
//! are rejected here before any tree is built.

/// Deepest array/object nesting accepted in a JSON payload.
pub const MAX_JSON_DEPTH: usize = 128;

/// Whether `bytes` opens more than `limit` nested arrays or objects.
///
/// Brackets inside string literals are ignored. The scan does not validate
/// the document; malformed input is left for the decoder to report.
pub(crate) fn exceeds_depth(bytes: &[u8], limit: usize) -> bool {
    let mut depth = 0_usize;
    let mut in_string = false;
    let mut escaped = false;
    for &byte in bytes {
        if in_string {
            match byte {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match byte {
            b'"' => in_string = true,
            b'[' | b'{' => {
                depth += 1;
                if depth > limit {
                    return true;
                }
            }
            b']' | b'}' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    false
}

/// Message used when a payload is rejected for depth.
pub(crate) fn depth_message() -> String {
    format!("nesting exceeds {MAX_JSON_DEPTH} levels")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn nested(depth: usize) -> String {
        format!("{}1{}", "[".repeat(depth), "]".repeat(depth))
    }

    #[rstest]
    #[case::flat(br#"{"a": [1, 2]}"#.to_vec(), false)]
    #[case::at_limit(nested(MAX_JSON_DEPTH).into_bytes(), false)]
    #[case::past_limit(nested(MAX_JSON_DEPTH + 1).into_bytes(), true)]
    #[case::brackets_in_strings(format!(r#"["{}"]"#, "[".repeat(500)).into_bytes(), false)]
    #[case::escaped_quote(format!(r#"["\"{}"]"#, "{".repeat(500)).into_bytes(), false)]
    #[case::unbalanced_closers(b"]]]]{}".to_vec(), false)]
    fn measures_nesting(#[case] body: Vec<u8>, #[case] expected: bool) {
        assert_eq!(exceeds_depth(&body, MAX_JSON_DEPTH), expected);
    }

    #[rstest]
    fn sibling_containers_do_not_accumulate() {
        let body = format!("[{}[1]]", "[1],".repeat(500));
        assert!(!exceeds_depth(body.as_bytes(), MAX_JSON_DEPTH));
    }
}
