//! Input description of a box to embed or append
//!
//! A [`BoxSource`] lists the directories and files discovered for one box.
//! How they were discovered (directory walk, manifest, build script) is up
//! to the caller. [`BoxSource::layout`] normalizes the listing into the
//! shape both the generator and the archive writer consume.

use crate::archive::parent_key;
use anyhow::{bail, Result};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::SystemTime;

/// A directory inside a box
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDir {
    /// Path relative to the box root
    pub path: String,
    pub modified: SystemTime,
}

/// A file inside a box
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Path relative to the box root
    pub path: String,
    pub modified: SystemTime,
    /// Where the content is read from
    pub origin: PathBuf,
}

/// Files and directories making up one box
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoxSource {
    pub name: String,
    /// Box build time; also used for directories that were not listed
    pub modified: SystemTime,
    pub dirs: Vec<SourceDir>,
    pub files: Vec<SourceFile>,
}

/// Normalized listing: root and all ancestor directories present, sorted by path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoxLayout {
    pub name: String,
    pub modified: SystemTime,
    pub dirs: Vec<SourceDir>,
    pub files: Vec<SourceFile>,
}

impl BoxSource {
    /// Create an empty box source stamped with the current time
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            modified: SystemTime::now(),
            dirs: Vec::new(),
            files: Vec::new(),
        }
    }

    /// Set the box build time
    pub fn with_modified(mut self, modified: SystemTime) -> Self {
        self.modified = modified;
        self
    }

    pub fn add_dir(&mut self, path: impl Into<String>, modified: SystemTime) {
        self.dirs.push(SourceDir { path: path.into(), modified });
    }

    pub fn add_file(
        &mut self,
        path: impl Into<String>,
        modified: SystemTime,
        origin: impl Into<PathBuf>,
    ) {
        self.files.push(SourceFile {
            path: path.into(),
            modified,
            origin: origin.into(),
        });
    }

    /// Normalize paths, add the root and missing ancestors, reject duplicates
    pub fn layout(&self) -> Result<BoxLayout> {
        if self.name.trim_matches('/').is_empty() {
            bail!("Box name must not be empty");
        }
        if self.name.contains('/') || self.name.contains('\\') {
            bail!("Box name must not contain path separators: {}", self.name);
        }

        let mut dirs: BTreeMap<String, SourceDir> = BTreeMap::new();
        for dir in &self.dirs {
            let path = normalize_path(&dir.path);
            let source_dir = SourceDir { path: path.clone(), modified: dir.modified };
            if dirs.insert(path.clone(), source_dir).is_some() {
                bail!("Duplicate directory in box {}: {}", self.name, path);
            }
        }

        let mut files: BTreeMap<String, SourceFile> = BTreeMap::new();
        for file in &self.files {
            let path = normalize_path(&file.path);
            if path.is_empty() {
                bail!("File with empty path in box {}", self.name);
            }
            if dirs.contains_key(&path) {
                bail!("Path is both a file and a directory in box {}: {}", self.name, path);
            }
            let normalized = SourceFile {
                path: path.clone(),
                modified: file.modified,
                origin: file.origin.clone(),
            };
            if files.insert(path.clone(), normalized).is_some() {
                bail!("Duplicate file in box {}: {}", self.name, path);
            }
        }

        // every directory and file needs its ancestors, down to the root
        let mut ancestors = vec![String::new()];
        for path in dirs.keys().chain(files.keys()) {
            let mut current = path.as_str();
            while !current.is_empty() {
                current = parent_key(current);
                ancestors.push(current.to_string());
            }
        }
        for path in ancestors {
            if files.contains_key(&path) {
                bail!("File used as a directory in box {}: {}", self.name, path);
            }
            dirs.entry(path.clone()).or_insert_with(|| SourceDir {
                path,
                modified: self.modified,
            });
        }

        Ok(BoxLayout {
            name: self.name.clone(),
            modified: self.modified,
            dirs: dirs.into_values().collect(),
            files: files.into_values().collect(),
        })
    }
}

/// Forward slashes, no leading or trailing separator
pub fn normalize_path(path: &str) -> String {
    path.replace('\\', "/").trim_matches('/').to_string()
}
