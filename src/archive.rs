//! Box data structures

use std::borrow::Cow;
use std::collections::HashMap;
use std::io::Cursor;
use std::time::{SystemTime, UNIX_EPOCH};

/// Archive comment that marks an entry as a directory
pub const DIR_COMMENT: &str = "dir";

/// Payload of a file entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Content {
    /// Fully materialized bytes (may be empty)
    Bytes(Cow<'static, [u8]>),
    /// Content could not be read or failed verification
    Unreadable,
}

impl Content {
    /// Content borrowed from a `'static` slice (generated code)
    pub fn from_static(bytes: &'static [u8]) -> Self {
        Content::Bytes(Cow::Borrowed(bytes))
    }

    /// Content owned by the box (decoded or read at startup)
    pub fn from_vec(bytes: Vec<u8>) -> Self {
        Content::Bytes(Cow::Owned(bytes))
    }

    /// The bytes, if the content is readable
    pub fn bytes(&self) -> Option<&[u8]> {
        match self {
            Content::Bytes(bytes) => Some(bytes),
            Content::Unreadable => None,
        }
    }
}

/// File or directory specific part of an entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryKind {
    /// Directory with the keys of its direct children, in discovery order
    Dir { children: Vec<String> },
    /// File with its payload
    File { content: Content },
}

/// A file or directory inside a box
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    path: String,
    name: String,
    modified: SystemTime,
    kind: EntryKind,
}

impl Entry {
    /// Create a directory entry without children
    pub fn dir(path: impl Into<String>, name: impl Into<String>, modified: SystemTime) -> Self {
        Self {
            path: path.into(),
            name: name.into(),
            modified,
            kind: EntryKind::Dir { children: Vec::new() },
        }
    }

    /// Create a file entry
    pub fn file(
        path: impl Into<String>,
        name: impl Into<String>,
        modified: SystemTime,
        content: Content,
    ) -> Self {
        Self {
            path: path.into(),
            name: name.into(),
            modified,
            kind: EntryKind::File { content },
        }
    }

    /// Path relative to the box root (`""` for the root itself)
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Display name (last path segment; the box name for the root)
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn modified(&self) -> SystemTime {
        self.modified
    }

    pub fn kind(&self) -> &EntryKind {
        &self.kind
    }

    pub fn is_dir(&self) -> bool {
        matches!(self.kind, EntryKind::Dir { .. })
    }

    /// Keys of the direct children (empty for files)
    pub fn children(&self) -> &[String] {
        match &self.kind {
            EntryKind::Dir { children } => children,
            EntryKind::File { .. } => &[],
        }
    }

    /// Payload of a file entry, `None` for directories
    pub fn content(&self) -> Option<&Content> {
        match &self.kind {
            EntryKind::File { content } => Some(content),
            EntryKind::Dir { .. } => None,
        }
    }

    /// Size in bytes; directories and unreadable files report 0
    pub fn size(&self) -> u64 {
        self.content()
            .and_then(Content::bytes)
            .map_or(0, |bytes| bytes.len() as u64)
    }

    /// Bytes of a file entry
    pub fn bytes(&self) -> Result<&[u8], EntryError> {
        match &self.kind {
            EntryKind::Dir { .. } => Err(EntryError::IsADirectory { path: self.path.clone() }),
            EntryKind::File { content } => content
                .bytes()
                .ok_or_else(|| EntryError::Unreadable { path: self.path.clone() }),
        }
    }

    fn push_child(&mut self, child: String) -> bool {
        match &mut self.kind {
            EntryKind::Dir { children } => {
                children.push(child);
                true
            }
            EntryKind::File { .. } => false,
        }
    }
}

/// Error for lookups inside a box
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryError {
    /// No entry with this path
    NotFound { path: String },
    /// Entry exists but is a file
    NotADirectory { path: String },
    /// Entry exists but is a directory
    IsADirectory { path: String },
    /// File content was lost to a read or integrity failure
    Unreadable { path: String },
}

impl std::fmt::Display for EntryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntryError::NotFound { path } => write!(f, "Entry not found: '{}'", path),
            EntryError::NotADirectory { path } => write!(f, "Not a directory: '{}'", path),
            EntryError::IsADirectory { path } => write!(f, "Is a directory: '{}'", path),
            EntryError::Unreadable { path } => {
                write!(f, "Content of '{}' is unavailable (read or checksum failure)", path)
            }
        }
    }
}

impl std::error::Error for EntryError {}

/// Error for box registration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// A box with this name is already registered
    DuplicateBox { name: String },
    /// Box names must not be empty
    EmptyName,
}

impl std::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistryError::DuplicateBox { name } => write!(f, "Duplicate box: '{}'", name),
            RegistryError::EmptyName => write!(f, "Box name must not be empty"),
        }
    }
}

impl std::error::Error for RegistryError {}

/// Directory portion of a box-relative path; top-level entries map to the root `""`
pub fn parent_key(path: &str) -> &str {
    match path.rsplit_once('/') {
        Some((parent, _)) => parent,
        None => "",
    }
}

/// Modification time as stored by both box formats: whole seconds since
/// the Unix epoch, clamped to `0..=u32::MAX`
pub fn stored_seconds(time: SystemTime) -> u32 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(elapsed) => u32::try_from(elapsed.as_secs()).unwrap_or(u32::MAX),
        Err(_) => 0,
    }
}

/// Last segment of a slash separated path
pub fn base_name(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rsplit_once('/') {
        Some((_, name)) => name,
        None => trimmed,
    }
}

/// A named collection of files and directories
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetBox {
    name: String,
    modified: SystemTime,
    entries: HashMap<String, Entry>,
}

impl AssetBox {
    /// Create an empty box
    pub fn new(name: impl Into<String>, modified: SystemTime) -> Self {
        Self {
            name: name.into(),
            modified,
            entries: HashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Build time of the box
    pub fn modified(&self) -> SystemTime {
        self.modified
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up an entry by its box-relative path
    pub fn entry(&self, path: &str) -> Option<&Entry> {
        self.entries.get(path.trim_matches('/'))
    }

    /// All entries, in no particular order
    pub fn entries(&self) -> impl Iterator<Item = &Entry> {
        self.entries.values()
    }

    /// All paths, sorted
    pub fn paths(&self) -> Vec<&str> {
        let mut paths: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        paths.sort_unstable();
        paths
    }

    /// Entry for `path` or `EntryError::NotFound`
    pub fn metadata(&self, path: &str) -> Result<&Entry, EntryError> {
        self.entry(path).ok_or_else(|| EntryError::NotFound { path: path.to_string() })
    }

    /// Direct children of the directory at `path`, sorted by name
    pub fn read_dir(&self, path: &str) -> Result<Vec<&Entry>, EntryError> {
        let dir = self.metadata(path)?;
        if !dir.is_dir() {
            return Err(EntryError::NotADirectory { path: path.to_string() });
        }

        let mut children: Vec<&Entry> = dir
            .children()
            .iter()
            .filter_map(|key| self.entries.get(key))
            .collect();
        children.sort_by(|a, b| a.name().cmp(b.name()));
        Ok(children)
    }

    /// Open the file at `path` for reading and seeking
    pub fn open(&self, path: &str) -> Result<Cursor<&[u8]>, EntryError> {
        self.metadata(path)?.bytes().map(Cursor::new)
    }

    /// Register an entry under its path, returning the entry it replaced
    pub(crate) fn insert(&mut self, entry: Entry) -> Option<Entry> {
        self.entries.insert(entry.path.clone(), entry)
    }

    /// Append `child` to the directory at `parent`; false if there is no such directory
    pub(crate) fn attach(&mut self, parent: &str, child: String) -> bool {
        match self.entries.get_mut(parent) {
            Some(dir) => dir.push_child(child),
            None => false,
        }
    }
}

/// Boxes by name, built once and read afterwards
#[derive(Debug, Clone, Default)]
pub struct BoxRegistry {
    boxes: HashMap<String, AssetBox>,
}

impl BoxRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a box; empty or already registered names are rejected
    pub fn register(&mut self, asset_box: AssetBox) -> Result<(), RegistryError> {
        if asset_box.name.is_empty() {
            return Err(RegistryError::EmptyName);
        }
        if self.boxes.contains_key(&asset_box.name) {
            return Err(RegistryError::DuplicateBox { name: asset_box.name });
        }
        self.boxes.insert(asset_box.name.clone(), asset_box);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&AssetBox> {
        self.boxes.get(name)
    }

    /// Registered box names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.boxes.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn iter(&self) -> impl Iterator<Item = &AssetBox> {
        self.boxes.values()
    }

    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }
}
