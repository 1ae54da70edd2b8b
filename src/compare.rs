//! Output normalization and comparison.

use crate::executor::{self, Invocation, Platform};
use serde_json::{Map, Value};
use std::borrow::Cow;
use std::io::Write;

/// Re-serialize a JSON document with every object's keys sorted.
///
/// Array order, value types and number spelling are preserved, so only key
/// order stops mattering when two canonical strings are compared.
pub fn canonicalize_json(text: &str) -> Result<String, serde_json::Error> {
    let value: Value = serde_json::from_str(text)?;
    serde_json::to_string(&sort_keys(value))
}

// `Map` only sorts while no crate in the build turns on serde_json's
// `preserve_order` feature, so key order is fixed explicitly.
fn sort_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            let mut sorted = Map::new();
            for (k, v) in entries {
                sorted.insert(k, sort_keys(v));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_keys).collect()),
        other => other,
    }
}

/// Rewrite `/` to `\` in an expected string when checking on a
/// backslash-path platform. Elsewhere the string is returned as is.
pub fn normalize_expected_paths(expected: &str, platform: Platform) -> Cow<'_, str> {
    if platform.uses_backslash() && expected.contains('/') {
        Cow::Owned(expected.replace('/', "\\"))
    } else {
        Cow::Borrowed(expected)
    }
}

/// Compare two outputs, ignoring leading and trailing whitespace.
pub fn outputs_match(expected: &str, actual: &str) -> bool {
    expected.trim() == actual.trim()
}

/// Produce a line diff between `expected` and `actual`.
///
/// Both strings go to temporary files that are compared with the external
/// `diff` tool. When the tool is unavailable, an in-process unified diff is
/// rendered instead. The temporary files are removed before returning.
pub fn render_diff(expected: &str, actual: &str) -> String {
    match external_diff(expected, actual) {
        Ok(diff) => diff,
        Err(e) => {
            log::warn!("external diff unavailable ({e}), using built-in diff");
            builtin_diff(expected, actual)
        }
    }
}

fn external_diff(expected: &str, actual: &str) -> Result<String, String> {
    let expected_file = write_temp(expected).map_err(|e| format!("temp file: {e}"))?;
    let actual_file = write_temp(actual).map_err(|e| format!("temp file: {e}"))?;

    let invocation = Invocation::Direct {
        program: "diff".to_string(),
        args: vec![
            expected_file.path().display().to_string(),
            actual_file.path().display().to_string(),
        ],
    };
    let result = executor::execute(&invocation).map_err(|e| e.to_string())?;

    // diff exits 0 for identical input, 1 for differences, 2 for trouble
    match result.exit_code {
        Some(0 | 1) => Ok(result.stdout_text()),
        _ => Err(format!(
            "diff failed with {}: {}",
            result.status_description(),
            result.stderr_text().trim()
        )),
    }
}

fn write_temp(contents: &str) -> std::io::Result<tempfile::NamedTempFile> {
    let mut file = tempfile::NamedTempFile::new()?;
    file.write_all(contents.as_bytes())?;
    file.flush()?;
    Ok(file)
}

fn builtin_diff(expected: &str, actual: &str) -> String {
    similar::TextDiff::from_lines(expected, actual)
        .unified_diff()
        .header("expected", "actual")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== JSON Canonicalization Tests ====================

    #[test]
    fn test_canonical_json_ignores_key_order() {
        assert_eq!(
            canonicalize_json(r#"{"a":1,"b":2}"#).unwrap(),
            canonicalize_json(r#"{"b":2,"a":1}"#).unwrap()
        );
    }

    #[test]
    fn test_canonical_json_sorts_nested_objects() {
        let got = canonicalize_json(r#"{"z": {"y": 1, "x": [{"b": 1, "a": 2}]}, "a": null}"#)
            .unwrap();
        assert_eq!(got, r#"{"a":null,"z":{"x":[{"a":2,"b":1}],"y":1}}"#);
    }

    #[test]
    fn test_canonical_json_keeps_value_types() {
        assert_ne!(
            canonicalize_json(r#"{"a":1,"b":2}"#).unwrap(),
            canonicalize_json(r#"{"a":1,"b":"2"}"#).unwrap()
        );
    }

    #[test]
    fn test_canonical_json_keeps_array_order() {
        assert_ne!(
            canonicalize_json("[1, 2]").unwrap(),
            canonicalize_json("[2, 1]").unwrap()
        );
    }

    #[test]
    fn test_canonical_json_rejects_non_json() {
        assert!(canonicalize_json("not json").is_err());
        assert!(canonicalize_json("").is_err());
        assert!(canonicalize_json("{} {}").is_err());
    }

    // ==================== Path Normalization Tests ====================

    #[test]
    fn test_paths_rewritten_on_windows() {
        assert_eq!(
            normalize_expected_paths("testdata/a.json", Platform::Windows),
            "testdata\\a.json"
        );
    }

    #[test]
    fn test_paths_untouched_on_unix() {
        let got = normalize_expected_paths("testdata/a.json", Platform::Unix);
        assert!(matches!(got, Cow::Borrowed("testdata/a.json")));
    }

    #[test]
    fn test_paths_without_slash_untouched() {
        let got = normalize_expected_paths("no separators", Platform::Windows);
        assert!(matches!(got, Cow::Borrowed(_)));
    }

    // ==================== Comparison Tests ====================

    #[test]
    fn test_outputs_match_trims_both_sides() {
        assert!(outputs_match("1\n2", "  1\n2\n\n"));
        assert!(!outputs_match("1\n2", "1\n 2"));
    }

    #[test]
    fn test_builtin_diff_marks_changed_lines() {
        let diff = builtin_diff("a\nb\n", "a\nc\n");
        assert!(diff.contains("--- expected"));
        assert!(diff.contains("+++ actual"));
        assert!(diff.contains("-b"));
        assert!(diff.contains("+c"));
    }

    #[test]
    fn test_render_diff_shows_both_sides() {
        // Works with either the external tool or the built-in fallback
        let diff = render_diff("1\n2", "1\n3");
        assert!(diff.contains('2'));
        assert!(diff.contains('3'));
    }
}
