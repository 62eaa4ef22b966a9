//! Store handle and on-disk layout for docpulse state.
//!
//! A project carries one root-level `.pulse/` directory holding the
//! registry database and generated artifacts. Each registered system owns
//! its own `.pulse/` bundle (snapshot, constraints, decisions, debt, adr/)
//! under the system directory. The root `.pulse/` is never a bundle.

use crate::core::error::DocPulseError;
use std::path::{Path, PathBuf};

/// Directory name used for both the root store and per-system bundles.
pub const PULSE_DIR: &str = ".pulse";

/// Handle for a docpulse project store.
///
/// `root` is the absolute project root (the directory containing the
/// top-level `.pulse/`). All components receive this handle explicitly;
/// there is no ambient global store.
#[derive(Debug, Clone)]
pub struct Store {
    /// Absolute path to the project root directory
    pub root: PathBuf,
}

impl Store {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Walk up from `start` until a `.pulse/` directory is found.
    pub fn discover(start: &Path) -> Result<Self, DocPulseError> {
        let mut current = PathBuf::from(start);
        loop {
            if current.join(PULSE_DIR).is_dir() {
                return Ok(Self { root: current });
            }
            if !current.pop() {
                return Err(DocPulseError::NotFound(
                    "'.pulse' directory not found in current or parent directories. Run `docpulse init` first.".to_string(),
                ));
            }
        }
    }

    pub fn pulse_dir(&self) -> PathBuf {
        self.root.join(PULSE_DIR)
    }

    pub fn data_dir(&self) -> PathBuf {
        self.pulse_dir().join("data")
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir().join("context.db")
    }

    /// Generated dependency-graph artifact.
    pub fn graph_path(&self) -> PathBuf {
        self.pulse_dir().join("graph.json")
    }

    pub fn config_path(&self) -> PathBuf {
        self.pulse_dir().join("config.toml")
    }

    /// Bundle directory for a registered system path (relative to root).
    pub fn bundle_dir(&self, system_path: &str) -> PathBuf {
        self.root.join(system_path).join(PULSE_DIR)
    }
}
