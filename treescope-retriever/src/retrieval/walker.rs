//! Lazy traversal of a document folder.

use crate::error::{RetrievalError, Result};
use std::path::{Path, PathBuf};

/// A candidate document found under the index root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredFile {
    pub path: PathBuf,
    pub size: u64,
}

/// Walks a folder tree yielding files with a supported extension.
///
/// Entries are visited in file-name order so repeated runs over the same
/// tree index documents in the same order. Hidden files and directories are
/// skipped. Symlinks are followed and reported under their own path. The
/// iterator is single-pass.
///
/// Unreadable directories and entries, dangling symlinks and symlink loops
/// surface as `Err` items carrying the offending path; the walk continues
/// past them.
pub struct DocumentWalker {
    root: PathBuf,
    extensions: Vec<String>,
    inner: ignore::Walk,
}

impl DocumentWalker {
    pub fn new(root: &Path, extensions: &[String]) -> Self {
        Self::build(root, extensions, false)
    }

    /// Like [`DocumentWalker::new`], but honours `.gitignore` and `.ignore` files.
    pub fn respecting_ignore_files(root: &Path, extensions: &[String]) -> Self {
        Self::build(root, extensions, true)
    }

    fn build(root: &Path, extensions: &[String], respect_ignore_files: bool) -> Self {
        let inner = ignore::WalkBuilder::new(root)
            .hidden(true)
            .follow_links(true)
            .parents(respect_ignore_files)
            .ignore(respect_ignore_files)
            .git_ignore(respect_ignore_files)
            .git_global(respect_ignore_files)
            .git_exclude(respect_ignore_files)
            .require_git(false)
            .sort_by_file_name(|a, b| a.cmp(b))
            .build();

        Self {
            root: root.to_path_buf(),
            extensions: extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
            inner,
        }
    }

    fn has_supported_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| {
                let e = e.to_ascii_lowercase();
                self.extensions.iter().any(|supported| *supported == e)
            })
            .unwrap_or(false)
    }

    fn walk_error(&self, err: ignore::Error) -> RetrievalError {
        let path = error_path(&err).unwrap_or_else(|| self.root.clone());
        RetrievalError::extraction(path, err.to_string())
    }
}

fn error_path(err: &ignore::Error) -> Option<PathBuf> {
    match err {
        ignore::Error::WithPath { path, .. } => Some(path.clone()),
        ignore::Error::Loop { child, .. } => Some(child.clone()),
        ignore::Error::WithDepth { err, .. } | ignore::Error::WithLineNumber { err, .. } => {
            error_path(err)
        }
        _ => None,
    }
}

impl Iterator for DocumentWalker {
    type Item = Result<DiscoveredFile>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let entry = match self.inner.next()? {
                Ok(entry) => entry,
                Err(err) => return Some(Err(self.walk_error(err))),
            };

            let is_file = entry.file_type().is_some_and(|t| t.is_file());
            if !is_file || !self.has_supported_extension(entry.path()) {
                continue;
            }

            let size = match entry.metadata() {
                Ok(metadata) => metadata.len(),
                Err(err) => return Some(Err(self.walk_error(err))),
            };
            return Some(Ok(DiscoveredFile {
                path: entry.into_path(),
                size,
            }));
        }
    }
}
