#![allow(dead_code)]

use std::path::{Path, PathBuf};

use docshift::pipeline::Pipeline;
use docshift_config::shared::{IndentConfig, TransformConfig};
use serde_json::Value;
use tempfile::TempDir;

/// Scratch directory holding one source file and one target file.
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    /// Writes `contents` to a file named `name` and returns its path.
    pub fn file(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    /// Returns the path of a file named `name` that does not exist yet.
    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }
}

pub fn pipeline(indent: IndentConfig) -> Pipeline {
    let mut config = TransformConfig::default();
    config.writer.indent = indent;
    Pipeline::new(config).unwrap()
}

pub fn read(path: &Path) -> String {
    std::fs::read_to_string(path).unwrap()
}

pub fn read_json(path: &Path) -> Value {
    serde_json::from_str(&read(path)).unwrap()
}
