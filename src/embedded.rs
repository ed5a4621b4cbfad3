//! Runtime support for generated box code
//!
//! Code produced by [`crate::generator`] calls [`EmbeddedBoxBuilder`] in
//! three phases: declare every directory, declare every file, then link
//! each directory to its children. Nodes are referred to by [`NodeId`]
//! handles, so links only ever point at nodes that already exist.

use crate::archive::{base_name, AssetBox, Content, Entry, RegistryError};
use crate::codec::{self, CodecError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Error returned by generated registration code
#[derive(Debug)]
pub enum EmbedError {
    /// Compressed content could not be decoded
    Codec { path: String, source: CodecError },
    /// The box could not be registered
    Registry(RegistryError),
}

impl std::fmt::Display for EmbedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EmbedError::Codec { path, source } => {
                write!(f, "Failed to decode embedded file '{}': {}", path, source)
            }
            EmbedError::Registry(err) => write!(f, "Failed to register embedded box: {}", err),
        }
    }
}

impl std::error::Error for EmbedError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EmbedError::Codec { source, .. } => Some(source),
            EmbedError::Registry(err) => Some(err),
        }
    }
}

impl From<RegistryError> for EmbedError {
    fn from(err: RegistryError) -> Self {
        EmbedError::Registry(err)
    }
}

/// Handle to a node declared on an [`EmbeddedBoxBuilder`]
///
/// A handle is only meaningful to the builder that returned it. Links that
/// name a node the builder does not have are dropped by
/// [`EmbeddedBoxBuilder::finish`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeId(usize);

/// Assembles an [`AssetBox`] from literal content
#[derive(Debug)]
pub struct EmbeddedBoxBuilder {
    name: String,
    modified: SystemTime,
    nodes: Vec<Entry>,
    links: Vec<(NodeId, NodeId)>,
}

impl EmbeddedBoxBuilder {
    /// Start a box; `modified` is seconds since the Unix epoch
    pub fn new(name: &str, modified: u64) -> Self {
        Self {
            name: name.to_string(),
            modified: unix_time(modified),
            nodes: Vec::new(),
            links: Vec::new(),
        }
    }

    /// Declare a directory (`""` is the box root)
    pub fn dir(&mut self, path: &str, modified: u64) -> NodeId {
        let name = if path.is_empty() { self.name.as_str() } else { base_name(path) };
        let entry = Entry::dir(path, name, unix_time(modified));
        self.push(entry)
    }

    /// Declare a file whose bytes are embedded as-is
    pub fn file(&mut self, path: &str, modified: u64, content: &'static [u8]) -> NodeId {
        let content = Content::from_static(content);
        let entry = Entry::file(path, base_name(path), unix_time(modified), content);
        self.push(entry)
    }

    /// Declare a file embedded as zlib + Ascii85 text
    pub fn compressed_file(
        &mut self,
        path: &str,
        modified: u64,
        encoded: &str,
    ) -> Result<NodeId, EmbedError> {
        let bytes = codec::decompress(encoded).map_err(|source| EmbedError::Codec {
            path: path.to_string(),
            source,
        })?;
        let content = Content::from_vec(bytes);
        let entry = Entry::file(path, base_name(path), unix_time(modified), content);
        Ok(self.push(entry))
    }

    /// Make `children` the next children of directory `parent`
    pub fn link(&mut self, parent: NodeId, children: &[NodeId]) {
        self.links.extend(children.iter().map(|&child| (parent, child)));
    }

    /// Finish the box
    pub fn finish(self) -> AssetBox {
        let mut resolved: Vec<(String, String)> = Vec::with_capacity(self.links.len());
        for &(parent, child) in &self.links {
            if parent == child {
                continue;
            }
            match (self.nodes.get(parent.0), self.nodes.get(child.0)) {
                (Some(parent), Some(child)) => {
                    resolved.push((parent.path().to_string(), child.path().to_string()));
                }
                _ => log::warn!(
                    "Skipping link {:?} -> {:?} in box {}: unknown node",
                    parent,
                    child,
                    self.name
                ),
            }
        }

        let mut asset_box = AssetBox::new(self.name, self.modified);
        for node in self.nodes {
            asset_box.insert(node);
        }
        for (parent, child) in resolved {
            asset_box.attach(&parent, child);
        }
        asset_box
    }

    fn push(&mut self, entry: Entry) -> NodeId {
        self.nodes.push(entry);
        NodeId(self.nodes.len() - 1)
    }
}

fn unix_time(secs: u64) -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(secs)
}
