//! Test helpers shared by the workspace: fixture discovery under
//! `test_data/` and the `;; EXPECT_*` markers fixtures declare.

use std::path::PathBuf;

use once_cell::sync::Lazy;
use thiserror::Error;

pub(crate) static WORKSPACE_ROOT: Lazy<PathBuf> = Lazy::new(|| {
    let mut current = PathBuf::from(env!("CARGO_MANIFEST_DIR"));

    loop {
        if current.join("Cargo.toml").exists() {
            let cargo_toml = std::fs::read_to_string(current.join("Cargo.toml"))
                .expect("Failed to read Cargo.toml");
            if cargo_toml.contains("[workspace]") {
                return current;
            }
        }

        current = current
            .parent()
            .expect("Could not find workspace root")
            .to_path_buf();
    }
});

const STATUS_MARKER: &str = "EXPECT_STATUS:";
const STDOUT_MARKER: &str = "EXPECT_STDOUT:";

pub fn test_data_path() -> PathBuf {
    WORKSPACE_ROOT.join("test_data")
}

/// Get the path to a test fixture file relative to the test_data directory
///
/// ## Arguments
/// * `name` - The relative path to the fixture file (e.g., "fib.s")
pub fn fixture_path(name: &str) -> PathBuf {
    test_data_path().join(name)
}

/// Read the contents of a test fixture file
///
/// ## Arguments
/// * `name` - The relative path to the fixture file (e.g., "fib.s")
///
/// ## Returns
/// The contents of the fixture file as a String
pub fn read_fixture(name: &str) -> String {
    let path = fixture_path(name);
    std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("Failed to read fixture '{}': {}", path.display(), e))
}

/// List the assembly fixtures (`*.s`) of `test_data/`, sorted by name.
pub fn list_fixtures() -> Vec<String> {
    let dir_path = test_data_path();

    let mut fixtures: Vec<String> = std::fs::read_dir(&dir_path)
        .unwrap_or_else(|e| panic!("Failed to read directory '{}': {}", dir_path.display(), e))
        .filter_map(|entry| {
            entry.ok().and_then(|e| {
                let path = e.path();
                if path.extension()?.to_str()? == "s" {
                    path.file_name()?.to_str().map(String::from)
                } else {
                    None
                }
            })
        })
        .collect();
    fixtures.sort();
    tracing::debug!(count = fixtures.len(), "listed fixtures");
    fixtures
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExpectationError {
    #[error("line {line}: invalid expected status '{value}'")]
    InvalidStatus { line: usize, value: String },
    #[error("line {line}: status declared twice")]
    DuplicateStatus { line: usize },
}

/// What running a fixture must produce, read from its header comments:
///
/// ```text
/// ;; EXPECT_STATUS: 13
/// ;; EXPECT_STDOUT: hello\n
/// ```
///
/// Only the leading block of comment and blank lines is scanned. `\n` in an
/// `EXPECT_STDOUT` value stands for a newline; several `EXPECT_STDOUT` lines
/// are concatenated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FixtureExpectation {
    pub status: Option<u64>,
    pub stdout: Option<String>,
}

impl FixtureExpectation {
    pub fn parse(source: &str) -> Result<Self, ExpectationError> {
        let mut expectation = Self::default();

        for (index, raw) in source.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }
            let Some(comment) = line.strip_prefix(';') else {
                break;
            };
            let comment = comment.trim_start_matches(';').trim();

            if let Some(value) = comment.strip_prefix(STATUS_MARKER) {
                if expectation.status.is_some() {
                    return Err(ExpectationError::DuplicateStatus { line: index + 1 });
                }
                let value = value.trim();
                let status = value
                    .parse()
                    .map_err(|_| ExpectationError::InvalidStatus {
                        line: index + 1,
                        value: value.to_string(),
                    })?;
                expectation.status = Some(status);
            } else if let Some(value) = comment.strip_prefix(STDOUT_MARKER) {
                let text = value.strip_prefix(' ').unwrap_or(value).replace("\\n", "\n");
                expectation
                    .stdout
                    .get_or_insert_with(String::new)
                    .push_str(&text);
            }
        }

        Ok(expectation)
    }

    /// Whether the fixture declares nothing to check.
    pub const fn is_empty(&self) -> bool {
        self.status.is_none() && self.stdout.is_none()
    }
}
