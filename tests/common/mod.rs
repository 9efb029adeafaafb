#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::{TempDir, tempdir};

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    /// Creates a fresh scratch directory for the current test case.
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` to `name` (creating parent directories) and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent dirs");
        }
        fs::write(&path, contents).expect("write temp file contents");
        path
    }

    pub fn read(&self, name: &str) -> String {
        fs::read_to_string(self.temp_dir.path().join(name)).expect("read temp file")
    }
}

/// Splits SQL text into complete `;`-terminated statements.
pub fn statements(sql: &str) -> Vec<&str> {
    sql.split_inclusive(";\n")
        .map(str::trim)
        .filter(|stmt| !stmt.is_empty())
        .collect()
}

pub fn insert_commands(sql: &str) -> Vec<&str> {
    statements(sql)
        .into_iter()
        .filter(|stmt| stmt.starts_with("INSERT INTO"))
        .collect()
}
