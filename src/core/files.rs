// src/core/files.rs

//! Ordered collections of local files to upload.
//!
//! A `FileSet` remembers what the caller registered (explicit paths and glob
//! patterns) and re-resolves it on every call to [`FileSet::iter`]. Nothing is
//! cached, so files that disappear between two iterations are simply skipped.

use crate::core::MossError;
use std::env;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A registered source of files.
#[derive(Debug, Clone, PartialEq, Eq)]
enum FileEntry {
    Path(PathBuf),
    Glob(String),
}

/// A lazily evaluated, restartable sequence of regular files.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileSet {
    entries: Vec<FileEntry>,
}

impl FileSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a single file. `~` and environment variables are expanded and
    /// the result is made absolute. The file must exist and be a regular file now.
    pub fn add_path(&mut self, path: impl AsRef<Path>) -> Result<&mut Self, MossError> {
        let original = path.as_ref();
        let resolved = resolve_path(original)?;
        if !resolved.exists() {
            return Err(MossError::FileNotFound(original.to_path_buf()));
        }
        if !resolved.is_file() {
            return Err(MossError::NotAFile(original.to_path_buf()));
        }
        self.entries.push(FileEntry::Path(resolved));
        Ok(self)
    }

    /// Registers a glob pattern (`**` matches across directories). Only the
    /// syntax is checked here; matching happens on each iteration.
    pub fn add_glob(&mut self, pattern: &str) -> Result<&mut Self, MossError> {
        let expanded = expand_str(pattern);
        glob::Pattern::new(&expanded).map_err(|e| MossError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: e.msg.to_string(),
        })?;
        self.entries.push(FileEntry::Glob(expanded));
        Ok(self)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Yields glob matches first (patterns in registration order), then the
    /// explicit paths, keeping only entries that are regular files right now.
    pub fn iter(&self) -> impl Iterator<Item = PathBuf> + '_ {
        let globs = self
            .entries
            .iter()
            .filter_map(|entry| match entry {
                FileEntry::Glob(pattern) => Some(pattern.as_str()),
                FileEntry::Path(_) => None,
            })
            .flat_map(expand_glob);
        let paths = self.entries.iter().filter_map(|entry| match entry {
            FileEntry::Path(path) => Some(path.clone()),
            FileEntry::Glob(_) => None,
        });
        globs.chain(paths).filter(|path| path.is_file())
    }
}

fn expand_glob(pattern: &str) -> Box<dyn Iterator<Item = PathBuf> + Send + '_> {
    match glob::glob(pattern) {
        Ok(paths) => Box::new(paths.filter_map(move |entry| match entry {
            Ok(path) => Some(path),
            Err(e) => {
                debug!("Skipping unreadable glob entry for '{}': {}", pattern, e);
                None
            }
        })),
        // Patterns are validated on registration.
        Err(_) => Box::new(std::iter::empty()),
    }
}

/// Expands a leading `~` and `$VAR` / `${VAR}` references. Unknown variables
/// are left untouched.
pub(crate) fn expand_str(input: &str) -> String {
    shellexpand::full_with_context_no_errors(input, home_dir, |var| env::var(var).ok())
        .into_owned()
}

fn home_dir() -> Option<String> {
    directories::BaseDirs::new().map(|dirs| dirs.home_dir().to_string_lossy().into_owned())
}

/// Expands and absolutizes `path`. Non-UTF-8 paths are kept byte for byte.
fn resolve_path(path: &Path) -> Result<PathBuf, MossError> {
    let expanded = match path.to_str() {
        Some(text) => PathBuf::from(expand_str(text)),
        None => path.to_path_buf(),
    };
    if expanded.is_absolute() {
        return Ok(expanded);
    }
    let cwd = env::current_dir().map_err(|e| MossError::file_access(path, e))?;
    Ok(cwd.join(expanded))
}
