//! Documentation-bundle scaffolding.
//!
//! Creates a system's `.pulse/` bundle from embedded templates. Existing
//! files are never overwritten. On any failure mid-scaffold, files written
//! by this call are removed again so registration atomicity holds: either
//! the whole bundle lands or none of it does.

use crate::core::assets;
use crate::core::error::DocPulseError;
use std::fs;
use std::path::{Path, PathBuf};

/// Bundle documents created for every registered system.
pub const BUNDLE_DOCS: [(&str, &str); 4] = [
    ("snapshot.md", "snapshot"),
    ("constraints.md", "constraints"),
    ("decisions.md", "decisions"),
    ("debt.md", "debt"),
];

pub struct ScaffoldOutcome {
    /// Paths written by this call.
    pub files_written: Vec<PathBuf>,
    /// Whether this call created the bundle directory itself.
    pub created_dir: bool,
    bundle_dir: PathBuf,
}

impl ScaffoldOutcome {
    /// Undo exactly what this call created (registration rollback).
    pub fn rollback(&self) {
        for path in &self.files_written {
            let _ = fs::remove_file(path);
        }
        if self.created_dir {
            let _ = fs::remove_dir_all(&self.bundle_dir);
        }
    }
}

fn write_new_file(path: &Path, content: &str) -> Result<bool, DocPulseError> {
    if path.exists() {
        return Ok(false);
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(DocPulseError::IoError)?;
    }
    fs::write(path, content).map_err(DocPulseError::IoError)?;
    Ok(true)
}

/// Create the bundle for `system_name` at `bundle_dir`.
///
/// Pre-existing documents are left alone; only missing pieces are filled
/// in. Cleanup on failure removes exactly what this call created.
pub fn create_bundle(bundle_dir: &Path, system_name: &str) -> Result<ScaffoldOutcome, DocPulseError> {
    let created_dir = !bundle_dir.exists();
    let mut written: Vec<PathBuf> = Vec::new();

    let result = (|| -> Result<(), DocPulseError> {
        fs::create_dir_all(bundle_dir.join("adr")).map_err(DocPulseError::IoError)?;

        for (file_name, template_name) in BUNDLE_DOCS {
            let template = assets::get_template(template_name).ok_or_else(|| {
                DocPulseError::NotFound(format!("template '{}' not embedded", template_name))
            })?;
            let content = assets::render_template(template, &[("System Name", system_name)]);
            let dest = bundle_dir.join(file_name);
            if write_new_file(&dest, &content)? {
                written.push(dest);
            }
        }
        Ok(())
    })();

    match result {
        Ok(()) => Ok(ScaffoldOutcome {
            files_written: written,
            created_dir,
            bundle_dir: bundle_dir.to_path_buf(),
        }),
        Err(e) => {
            for path in &written {
                let _ = fs::remove_file(path);
            }
            if created_dir {
                let _ = fs::remove_dir_all(bundle_dir);
            }
            Err(e)
        }
    }
}
