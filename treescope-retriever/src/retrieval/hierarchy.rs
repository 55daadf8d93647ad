//! Folder-hierarchy metadata derived from a file's position under the index root.
//!
//! For `root/reports/2024/q1.txt` the extracted attributes are:
//!
//! | attribute       | value                 |
//! |-----------------|-----------------------|
//! | `folder_depth`  | `2`                   |
//! | `root_folder`   | `reports`             |
//! | `parent_folder` | `2024`                |
//! | `full_path`     | `reports/2024/q1.txt` |
//!
//! A file directly under the root has depth 0 and empty folder names.

use crate::error::{RetrievalError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Component, Path};

/// Upper bound on `root_folder` and `parent_folder`, in bytes.
pub const MAX_FOLDER_NAME_BYTES: usize = 200;
/// Upper bound on `full_path`, in bytes.
pub const MAX_FULL_PATH_BYTES: usize = 500;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FolderHierarchy {
    /// Directory segments between the root and the file
    pub folder_depth: u32,
    /// First directory under the root, empty at depth 0
    pub root_folder: String,
    /// Immediate parent directory name, empty at depth 0
    pub parent_folder: String,
    /// `/`-joined path relative to the root, file name included
    pub full_path: String,
}

impl FolderHierarchy {
    /// Derive the hierarchy attributes of `file_path` relative to `root_path`.
    ///
    /// Only path structure is inspected; the file is never opened. Paths
    /// outside the root, the root itself, `.`/`..` segments and non-UTF-8
    /// names are extraction errors.
    pub fn extract(file_path: &Path, root_path: &Path) -> Result<Self> {
        let relative = file_path.strip_prefix(root_path).map_err(|_| {
            RetrievalError::extraction(
                file_path,
                format!("not located under root {}", root_path.display()),
            )
        })?;

        let mut segments = Vec::new();
        for component in relative.components() {
            match component {
                Component::Normal(name) => {
                    let name = name.to_str().ok_or_else(|| {
                        RetrievalError::extraction(file_path, "path is not valid UTF-8")
                    })?;
                    segments.push(name);
                }
                _ => {
                    return Err(RetrievalError::extraction(
                        file_path,
                        "path must not contain '.' or '..' segments",
                    ));
                }
            }
        }

        let Some((_, folders)) = segments.split_last() else {
            return Err(RetrievalError::extraction(
                file_path,
                "path is the index root, not a file under it",
            ));
        };

        Ok(Self {
            folder_depth: folders.len() as u32,
            root_folder: folders.first().map(|s| s.to_string()).unwrap_or_default(),
            parent_folder: folders.last().map(|s| s.to_string()).unwrap_or_default(),
            full_path: segments.join("/"),
        })
    }

    /// File name component of `full_path`
    pub fn file_name(&self) -> &str {
        self.full_path
            .rsplit_once('/')
            .map(|(_, name)| name)
            .unwrap_or(&self.full_path)
    }

    /// Check the structural invariants and the stored field bounds.
    pub fn validate(&self) -> Result<()> {
        let invalid = |message: String| {
            Err(RetrievalError::extraction(self.full_path.as_str(), message))
        };

        if self.full_path.is_empty() {
            return invalid("empty path".to_string());
        }
        let parent_segments = self.full_path.matches('/').count() as u32;
        if parent_segments != self.folder_depth {
            return invalid(format!(
                "folder depth {} does not match path with {} parent segments",
                self.folder_depth, parent_segments
            ));
        }
        if self.folder_depth > 0 && self.root_folder.is_empty() {
            return invalid("nested file has an empty root folder".to_string());
        }
        if self.root_folder.len() > MAX_FOLDER_NAME_BYTES {
            return invalid(format!(
                "root folder is {} bytes, limit is {MAX_FOLDER_NAME_BYTES}",
                self.root_folder.len()
            ));
        }
        if self.parent_folder.len() > MAX_FOLDER_NAME_BYTES {
            return invalid(format!(
                "parent folder is {} bytes, limit is {MAX_FOLDER_NAME_BYTES}",
                self.parent_folder.len()
            ));
        }
        if self.full_path.len() > MAX_FULL_PATH_BYTES {
            return invalid(format!(
                "path is {} bytes, limit is {MAX_FULL_PATH_BYTES}",
                self.full_path.len()
            ));
        }
        Ok(())
    }
}
