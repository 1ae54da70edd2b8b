//! Schema definitions for clicheck case files.
//!
//! A case file declares the program under test and the ordered list of
//! cases to run against it. Case files are written in YAML, TOML or JSON
//! and deserialized into these types.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Root document of a case file.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CaseFile {
    /// Schema version.
    #[serde(default = "default_version")]
    pub version: u32,

    /// Executable placeholder used in commands (e.g. `./jqgo`).
    /// On Windows every occurrence gets the `.exe` suffix.
    #[serde(default)]
    pub executable: Option<String>,

    /// The cases, run in declaration order.
    pub cases: Vec<TestCase>,
}

fn default_version() -> u32 {
    1
}

/// A single declared case.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TestCase {
    /// Display name, also matched by `--filter` and `--filter-out`.
    pub name: String,

    /// Shell-like command line to run.
    #[serde(alias = "run")]
    pub command: String,

    /// Expected stdout, compared after trimming surrounding whitespace.
    /// Required unless `expect_failure` is set.
    #[serde(default, alias = "want")]
    pub expected_stdout: Option<String>,

    /// The command is expected to exit with a failure status.
    #[serde(default, alias = "fail")]
    pub expect_failure: bool,

    /// Compare stdout as JSON, ignoring object key order.
    #[serde(default, alias = "sort")]
    pub sort_as_json: bool,

    /// Skip this case on Windows.
    #[serde(default, alias = "win_skip")]
    pub skip_on_windows: bool,

    /// Upper bound on wall-clock duration, in whole seconds.
    #[serde(default, alias = "within_seconds")]
    pub time_limit_seconds: Option<u64>,

    /// Expected stderr, compared exactly.
    #[serde(default, alias = "want_stderr")]
    pub expected_stderr: Option<String>,

    /// Always run through the shell, even without a pipe.
    #[serde(default)]
    pub shell: bool,

    /// Do not rewrite the command for Windows.
    #[serde(default)]
    pub no_translate: bool,
}

impl TestCase {
    /// Create a case that expects `expected_stdout` from `command`.
    #[cfg_attr(not(test), allow(dead_code))]
    pub fn new(name: &str, command: &str, expected_stdout: &str) -> Self {
        Self {
            name: name.to_string(),
            command: command.to_string(),
            expected_stdout: Some(expected_stdout.to_string()),
            expect_failure: false,
            sort_as_json: false,
            skip_on_windows: false,
            time_limit_seconds: None,
            expected_stderr: None,
            shell: false,
            no_translate: false,
        }
    }
}

/// Generate the JSON schema for case files.
pub fn generate_schema() -> schemars::schema::RootSchema {
    schemars::schema_for!(CaseFile)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_lists_case_fields() {
        let schema = generate_schema();
        let json = serde_json::to_string(&schema).unwrap();
        assert!(json.contains("\"cases\""));
        assert!(json.contains("\"expected_stdout\""));
        assert!(json.contains("\"time_limit_seconds\""));
    }

    #[test]
    fn test_defaults_when_omitted() {
        let file: CaseFile = serde_yaml::from_str(
            r#"
cases:
  - name: basic
    command: echo 1
    expected_stdout: "1"
"#,
        )
        .unwrap();

        assert_eq!(file.version, 1);
        assert!(file.executable.is_none());
        let case = &file.cases[0];
        assert!(!case.expect_failure);
        assert!(!case.sort_as_json);
        assert!(!case.skip_on_windows);
        assert!(!case.shell);
        assert!(!case.no_translate);
        assert_eq!(case.time_limit_seconds, None);
        assert_eq!(case.expected_stderr, None);
    }

    #[test]
    fn test_short_aliases() {
        let file: CaseFile = serde_yaml::from_str(
            r#"
executable: ./jqgo
cases:
  - name: aliased
    run: ./jqgo a
    want: "1"
    fail: true
    sort: true
    win_skip: true
    within_seconds: 5
    want_stderr: "oops\n"
"#,
        )
        .unwrap();

        assert_eq!(file.executable.as_deref(), Some("./jqgo"));
        let case = &file.cases[0];
        assert_eq!(case.command, "./jqgo a");
        assert_eq!(case.expected_stdout.as_deref(), Some("1"));
        assert!(case.expect_failure);
        assert!(case.sort_as_json);
        assert!(case.skip_on_windows);
        assert_eq!(case.time_limit_seconds, Some(5));
        assert_eq!(case.expected_stderr.as_deref(), Some("oops\n"));
    }
}
