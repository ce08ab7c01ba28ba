//! Startup configuration: where the knowledge tree lives on disk.

use serde::Serialize;
use std::path::{Path, PathBuf};

/// Directory created inside the working directory.
const KNOWLEDGE_DIR: &str = "knowledge-tree";

/// One JSON record per element lives here.
const ELEMENTS_DIR: &str = "elements";

/// Singleton metadata record.
const METADATA_FILE: &str = "metadata.json";

/// Socket file name within the knowledge tree directory.
const SOCKET_FILE: &str = "daemon.sock";

/// PID file name within the knowledge tree directory.
const PID_FILE: &str = "daemon.pid";

/// Resolved storage locations, built once from the working directory argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    working_dir: PathBuf,
}

impl Config {
    /// Build a config rooted at `working_dir`.
    ///
    /// Relative paths are made absolute against the current directory so that
    /// later changes of the process cwd do not move the store.
    pub fn new(working_dir: impl AsRef<Path>) -> Self {
        let working_dir = working_dir.as_ref();
        let working_dir = std::path::absolute(working_dir).unwrap_or_else(|_| working_dir.to_path_buf());
        Self { working_dir }
    }

    /// Base working directory (parent of `knowledge-tree/`).
    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    pub fn knowledge_dir(&self) -> PathBuf {
        self.working_dir.join(KNOWLEDGE_DIR)
    }

    pub fn elements_dir(&self) -> PathBuf {
        self.knowledge_dir().join(ELEMENTS_DIR)
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.knowledge_dir().join(METADATA_FILE)
    }

    /// Get the daemon socket path.
    pub fn socket_path(&self) -> PathBuf {
        self.knowledge_dir().join(SOCKET_FILE)
    }

    /// Get the daemon PID file path.
    pub fn pid_path(&self) -> PathBuf {
        self.knowledge_dir().join(PID_FILE)
    }

    /// Describe the configured paths for the `get_working_directory_info` tool.
    pub fn describe(&self) -> WorkingDirectoryInfo {
        WorkingDirectoryInfo {
            base_working_dir: self.working_dir.display().to_string(),
            knowledge_tree_dir: self.knowledge_dir().display().to_string(),
            elements_dir: self.elements_dir().display().to_string(),
            metadata_file: self.metadata_path().display().to_string(),
            knowledge_tree_exists: self.knowledge_dir().exists(),
            base_dir_is_absolute: self.working_dir.is_absolute(),
        }
    }
}

/// Snapshot of the configured storage paths.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct WorkingDirectoryInfo {
    pub base_working_dir: String,
    pub knowledge_tree_dir: String,
    pub elements_dir: String,
    pub metadata_file: String,
    pub knowledge_tree_exists: bool,
    pub base_dir_is_absolute: bool,
}
