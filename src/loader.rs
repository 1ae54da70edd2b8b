//! Case file loader.
//!
//! Loads, parses and validates case files from disk.

use crate::schema::CaseFile;
use std::path::{Path, PathBuf};

/// Error type for case file loading operations.
#[derive(Debug)]
pub enum LoadError {
    /// Failed to read the file.
    Io(std::io::Error),
    /// Failed to parse YAML.
    Yaml(serde_yaml::Error),
    /// Failed to parse TOML.
    Toml(toml::de::Error),
    /// Failed to parse JSON.
    Json(serde_json::Error),
    /// Unsupported file extension.
    UnsupportedFormat(String),
    /// No case file in the given directory.
    NotFound(PathBuf),
    /// The file parsed but declares an unusable case.
    Invalid(String),
}

impl std::fmt::Display for LoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadError::Io(e) => write!(f, "failed to read file: {e}"),
            LoadError::Yaml(e) => write!(f, "invalid YAML: {e}"),
            LoadError::Toml(e) => write!(f, "invalid TOML: {e}"),
            LoadError::Json(e) => write!(f, "invalid JSON: {e}"),
            LoadError::UnsupportedFormat(ext) => {
                write!(
                    f,
                    "unsupported file format: {ext} (expected .yaml, .yml, .toml, or .json)"
                )
            }
            LoadError::NotFound(dir) => {
                write!(f, "no {CASE_FILE_STEM}.* case file in {}", dir.display())
            }
            LoadError::Invalid(msg) => write!(f, "invalid case file: {msg}"),
        }
    }
}

impl std::error::Error for LoadError {}

/// File stem looked up when a directory is given.
pub const CASE_FILE_STEM: &str = "clicheck";

/// Extensions tried, in order, when looking up a case file in a directory.
const CASE_FILE_EXTENSIONS: [&str; 4] = ["yaml", "yml", "toml", "json"];

/// Resolve the case file to load.
///
/// A file path is returned unchanged. For a directory, the first existing
/// `clicheck.{yaml,yml,toml,json}` inside it is returned.
pub fn find_case_file(path: &Path) -> Result<PathBuf, LoadError> {
    if path.is_file() {
        return Ok(path.to_path_buf());
    }

    CASE_FILE_EXTENSIONS
        .iter()
        .map(|ext| path.join(format!("{CASE_FILE_STEM}.{ext}")))
        .find(|candidate| candidate.is_file())
        .ok_or_else(|| LoadError::NotFound(path.to_path_buf()))
}

/// Load and validate a case file.
pub fn load_cases(path: &Path) -> Result<CaseFile, LoadError> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    let contents = std::fs::read_to_string(path).map_err(LoadError::Io)?;

    let file: CaseFile = match ext {
        "yaml" | "yml" => serde_yaml::from_str(&contents).map_err(LoadError::Yaml)?,
        "toml" => toml::from_str(&contents).map_err(LoadError::Toml)?,
        "json" => serde_json::from_str(&contents).map_err(LoadError::Json)?,
        other => return Err(LoadError::UnsupportedFormat(other.to_string())),
    };

    validate(&file)?;
    log::debug!("loaded {} case(s) from {}", file.cases.len(), path.display());
    Ok(file)
}

fn validate(file: &CaseFile) -> Result<(), LoadError> {
    for (idx, case) in file.cases.iter().enumerate() {
        if case.name.trim().is_empty() {
            return Err(LoadError::Invalid(format!("case #{} has an empty name", idx + 1)));
        }
        if case.command.trim().is_empty() {
            return Err(LoadError::Invalid(format!(
                "case {:?} has an empty command",
                case.name
            )));
        }
        if case.expected_stdout.is_none() && !case.expect_failure {
            return Err(LoadError::Invalid(format!(
                "case {:?} needs expected_stdout unless expect_failure is set",
                case.name
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn load_valid_yaml() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("clicheck.yaml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"
executable: ./jqgo
cases:
  - name: Basic test of d.b.c
    command: cat testdata/everything.json | ./jqgo d.b.c
    expected_stdout: "1"
  - name: Missing file
    command: ./jqgo a missing.json
    expect_failure: true
"#
        )
        .unwrap();

        let cases = load_cases(&path).unwrap();
        assert_eq!(cases.version, 1);
        assert_eq!(cases.cases.len(), 2);
        assert!(cases.cases[1].expect_failure);
    }

    #[test]
    fn load_valid_toml() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("clicheck.toml");
        std::fs::write(
            &path,
            r#"
version = 1

[[cases]]
name = "Very simple"
command = "cat testdata/simple.json | ./jqgo 'a'"
expected_stdout = "1\n2"
time_limit_seconds = 2
"#,
        )
        .unwrap();

        let cases = load_cases(&path).unwrap();
        assert_eq!(cases.cases[0].name, "Very simple");
        assert_eq!(cases.cases[0].time_limit_seconds, Some(2));
    }

    #[test]
    fn load_valid_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cases.json");
        std::fs::write(
            &path,
            r#"{"cases": [{"name": "sorted", "command": "echo {}", "expected_stdout": "{}", "sort_as_json": true}]}"#,
        )
        .unwrap();

        let cases = load_cases(&path).unwrap();
        assert!(cases.cases[0].sort_as_json);
    }

    #[test]
    fn load_invalid_yaml() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.yaml");
        std::fs::write(&path, "invalid: [yaml: {").unwrap();

        let result = load_cases(&path);
        assert!(matches!(result, Err(LoadError::Yaml(_))));
    }

    #[test]
    fn load_invalid_toml() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "invalid = [toml").unwrap();

        let result = load_cases(&path);
        assert!(matches!(result, Err(LoadError::Toml(_))));
    }

    #[test]
    fn unsupported_format() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cases.txt");
        std::fs::write(&path, "").unwrap();

        let result = load_cases(&path);
        assert!(matches!(result, Err(LoadError::UnsupportedFormat(_))));
    }

    #[test]
    fn missing_expected_stdout_is_invalid() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("clicheck.yaml");
        std::fs::write(
            &path,
            r#"
cases:
  - name: no expectation
    command: echo hi
"#,
        )
        .unwrap();

        let err = load_cases(&path).unwrap_err();
        assert!(matches!(err, LoadError::Invalid(_)));
        assert!(err.to_string().contains("no expectation"));
    }

    #[test]
    fn empty_command_is_invalid() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("clicheck.yaml");
        std::fs::write(
            &path,
            r#"
cases:
  - name: blank
    command: "  "
    expect_failure: true
"#,
        )
        .unwrap();

        assert!(matches!(load_cases(&path), Err(LoadError::Invalid(_))));
    }

    #[test]
    fn find_case_file_in_directory() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("clicheck.toml"), "").unwrap();
        std::fs::write(dir.path().join("clicheck.json"), "").unwrap();

        let found = find_case_file(dir.path()).unwrap();
        assert_eq!(found.file_name().unwrap(), "clicheck.toml");
    }

    #[test]
    fn find_case_file_passes_files_through() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("other.yaml");
        std::fs::write(&path, "").unwrap();

        assert_eq!(find_case_file(&path).unwrap(), path);
    }

    #[test]
    fn find_case_file_not_found() {
        let dir = tempdir().unwrap();
        let result = find_case_file(dir.path());
        assert!(matches!(result, Err(LoadError::NotFound(_))));
    }
}
