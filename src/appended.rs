//! Boxes appended to the running executable
//!
//! A box archive is a plain zip file concatenated onto an already built
//! executable. The zip end-of-central-directory record sits at the end of
//! the file, so the archive can be found without touching the executable's
//! own bytes.
//!
//! Entry layout inside the archive:
//!
//! ```text
//! assets/              comment "dir"   -> box "assets", root directory
//! assets/css/          comment "dir"   -> directory "css"
//! assets/css/site.css                  -> file "css/site.css"
//! ```
//!
//! Indexing runs in two passes: every entry is registered under its path
//! first, then each entry is attached to its parent directory in archive
//! order. Children are therefore linked no matter whether a directory comes
//! before or after its contents in the archive.

use crate::archive::{
    base_name, parent_key, AssetBox, BoxRegistry, Content, Entry, RegistryError, DIR_COMMENT,
};
use chrono::NaiveDateTime;
use log::{debug, warn};
use std::collections::HashMap;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use zip::read::ZipFile;
use zip::{ExtraField, ZipArchive};

// End of central directory record
const EOCD_SIGNATURE: &[u8; 4] = b"PK\x05\x06";
const EOCD_MIN_LEN: u64 = 22;
const MAX_ZIP_COMMENT_LEN: u64 = u16::MAX as u64;

static APPENDED_BOXES: OnceLock<BoxRegistry> = OnceLock::new();

/// Error type for locating and indexing an appended archive
#[derive(Debug)]
pub enum LocateError {
    /// Reading the executable failed
    Io(std::io::Error),
    /// A zip trailer was found but the archive could not be parsed
    Malformed(zip::result::ZipError),
    /// The archive produced an invalid box
    Registry(RegistryError),
}

impl std::fmt::Display for LocateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LocateError::Io(err) => write!(f, "I/O error reading appended archive: {}", err),
            LocateError::Malformed(err) => write!(f, "Malformed appended archive: {}", err),
            LocateError::Registry(err) => write!(f, "Invalid appended box: {}", err),
        }
    }
}

impl std::error::Error for LocateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LocateError::Io(err) => Some(err),
            LocateError::Malformed(err) => Some(err),
            LocateError::Registry(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for LocateError {
    fn from(err: std::io::Error) -> Self {
        LocateError::Io(err)
    }
}

impl From<RegistryError> for LocateError {
    fn from(err: RegistryError) -> Self {
        LocateError::Registry(err)
    }
}

/// Why the content of one archive entry was discarded
#[derive(Debug)]
pub enum EntryReadError {
    /// The zip reader cannot decode the entry (unsupported method, encryption)
    Open(zip::result::ZipError),
    /// Inflating the entry failed
    Io(std::io::Error),
    /// Inflated length differs from the declared size
    SizeMismatch { expected: u64, actual: u64 },
    /// CRC-32 of the inflated bytes differs from the stored one
    ChecksumMismatch { expected: u32, actual: u32 },
}

impl std::fmt::Display for EntryReadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntryReadError::Open(err) => write!(f, "cannot open entry: {}", err),
            EntryReadError::Io(err) => write!(f, "{}", err),
            EntryReadError::SizeMismatch { expected, actual } => {
                write!(f, "size mismatch: expected {} bytes, read {}", expected, actual)
            }
            EntryReadError::ChecksumMismatch { expected, actual } => {
                write!(f, "checksum mismatch: expected {:08x}, got {:08x}", expected, actual)
            }
        }
    }
}

impl std::error::Error for EntryReadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EntryReadError::Open(err) => Some(err),
            EntryReadError::Io(err) => Some(err),
            _ => None,
        }
    }
}

/// Path of the running executable with symlinks resolved
pub fn current_executable() -> Option<PathBuf> {
    let exe = std::env::current_exe().ok()?;
    std::fs::canonicalize(exe).ok()
}

/// A zip archive found at the end of a file
pub struct AppendedArchive<R: Read + Seek> {
    zip: ZipArchive<R>,
}

impl AppendedArchive<std::fs::File> {
    /// Open `path` and look for an appended archive.
    ///
    /// `Ok(None)` means the file does not exist or carries no archive.
    pub fn open(path: &Path) -> Result<Option<Self>, LocateError> {
        let file = match std::fs::File::open(path) {
            Ok(file) => file,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(LocateError::Io(err)),
        };
        Self::from_reader(file)
    }
}

impl<R: Read + Seek> AppendedArchive<R> {
    /// Look for an archive at the end of `reader`, whatever precedes it
    pub fn from_reader(mut reader: R) -> Result<Option<Self>, LocateError> {
        if !has_zip_trailer(&mut reader)? {
            return Ok(None);
        }
        reader.seek(SeekFrom::Start(0))?;
        let zip = ZipArchive::new(reader).map_err(LocateError::Malformed)?;
        Ok(Some(Self { zip }))
    }

    /// Number of raw archive entries
    pub fn len(&self) -> usize {
        self.zip.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zip.len() == 0
    }

    /// Build every box in the archive, consuming (and closing) it
    pub fn index(mut self) -> Result<BoxRegistry, LocateError> {
        let mut boxes: HashMap<String, AssetBox> = HashMap::new();
        // (box name, relative path) in archive order, for the linking pass
        let mut order: Vec<(String, String)> = Vec::new();

        for i in 0..self.zip.len() {
            let Some((box_name, relative, entry)) = self.read_entry(i) else {
                continue;
            };
            if box_name.is_empty() {
                return Err(RegistryError::EmptyName.into());
            }

            let asset_box = boxes
                .entry(box_name.clone())
                .or_insert_with(|| AssetBox::new(box_name.clone(), entry.modified()));
            if asset_box.insert(entry).is_some() {
                warn!("duplicate appended entry {}/{}, keeping the last one", box_name, relative);
            } else {
                order.push((box_name, relative));
            }
        }

        for (box_name, relative) in order {
            // box root is never its own child
            if relative.is_empty() {
                continue;
            }
            if let Some(asset_box) = boxes.get_mut(&box_name) {
                let parent = parent_key(&relative).to_string();
                asset_box.attach(&parent, relative);
            }
        }

        let mut registry = BoxRegistry::new();
        for (_, asset_box) in boxes {
            debug!("indexed appended box {} ({} entries)", asset_box.name(), asset_box.len());
            registry.register(asset_box)?;
        }
        Ok(registry)
    }

    /// Turn archive entry `index` into (box name, relative path, entry).
    ///
    /// Only an entry without a name is skipped; any other failure keeps the
    /// entry with unreadable content.
    fn read_entry(&mut self, index: usize) -> Option<(String, String, Entry)> {
        let raw = self.zip.by_index_raw(index).map(|file| EntryHeader::from_file(&file));
        let header = match raw {
            Ok(header) => header,
            Err(err) => {
                let name = self.zip.name_for_index(index)?;
                warn!("error opening appended entry {}: {}", name, err);
                EntryHeader::unreadable(name)
            }
        };

        let full_name = header.name.replace('\\', "/");
        let (box_name, relative) = split_box_path(&full_name);
        let display_name = base_name(&full_name).to_string();

        let entry = if header.is_dir {
            Entry::dir(relative.clone(), display_name, header.modified)
        } else {
            let content = if !header.readable {
                Content::Unreadable
            } else if header.size == 0 {
                Content::from_vec(Vec::new())
            } else {
                match self.read_content(index, header.size, header.crc32) {
                    Ok(bytes) => Content::from_vec(bytes),
                    Err(err) => {
                        warn!("error reading data for appended file {}: {}", full_name, err);
                        Content::Unreadable
                    }
                }
            };
            Entry::file(relative.clone(), display_name, header.modified, content)
        };

        Some((box_name, relative, entry))
    }

    fn read_content(
        &mut self,
        index: usize,
        size: u64,
        crc32: u32,
    ) -> Result<Vec<u8>, EntryReadError> {
        let mut file = self.zip.by_index(index).map_err(EntryReadError::Open)?;
        read_verified(&mut file, size, crc32)
    }
}

/// Central directory fields of one entry
struct EntryHeader {
    name: String,
    is_dir: bool,
    modified: SystemTime,
    size: u64,
    crc32: u32,
    readable: bool,
}

impl EntryHeader {
    fn from_file<R: Read>(file: &ZipFile<'_, R>) -> Self {
        Self {
            name: file.name().to_string(),
            is_dir: file.comment() == DIR_COMMENT,
            modified: entry_modified(file),
            size: file.size(),
            crc32: file.crc32(),
            readable: true,
        }
    }

    fn unreadable(name: &str) -> Self {
        Self {
            name: name.to_string(),
            is_dir: false,
            modified: UNIX_EPOCH,
            size: 0,
            crc32: 0,
            readable: false,
        }
    }
}

/// Split `box/rest/of/path` into the box name and the box-relative path
pub fn split_box_path(name: &str) -> (String, String) {
    let trimmed = name.trim_start_matches('/');
    match trimmed.split_once('/') {
        Some((box_name, rest)) => (box_name.to_string(), rest.trim_matches('/').to_string()),
        None => (trimmed.to_string(), String::new()),
    }
}

/// Read an entry to the end and verify its size and CRC-32
fn read_verified(
    reader: &mut impl Read,
    size: u64,
    expected_crc: u32,
) -> Result<Vec<u8>, EntryReadError> {
    let mut bytes = Vec::with_capacity(usize::try_from(size).unwrap_or(0));
    reader.read_to_end(&mut bytes).map_err(EntryReadError::Io)?;

    let actual = bytes.len() as u64;
    if actual != size {
        return Err(EntryReadError::SizeMismatch { expected: size, actual });
    }
    let actual_crc = crc32fast::hash(&bytes);
    if actual_crc != expected_crc {
        return Err(EntryReadError::ChecksumMismatch { expected: expected_crc, actual: actual_crc });
    }
    Ok(bytes)
}

/// Whether the file ends with an end-of-central-directory record.
///
/// A candidate signature only counts when the record's comment length
/// reaches exactly to the end of the file.
fn has_zip_trailer(reader: &mut (impl Read + Seek)) -> std::io::Result<bool> {
    let len = reader.seek(SeekFrom::End(0))?;
    if len < EOCD_MIN_LEN {
        return Ok(false);
    }
    let tail_len = len.min(EOCD_MIN_LEN + MAX_ZIP_COMMENT_LEN);
    reader.seek(SeekFrom::Start(len - tail_len))?;

    let mut tail = Vec::with_capacity(tail_len as usize);
    reader.by_ref().take(tail_len).read_to_end(&mut tail)?;

    let record_len = EOCD_MIN_LEN as usize;
    let found = (0..=tail.len() - record_len).rev().any(|pos| {
        let record = &tail[pos..pos + record_len];
        let comment_len = u16::from_le_bytes([record[20], record[21]]) as usize;
        &record[..4] == EOCD_SIGNATURE && pos + record_len + comment_len == tail.len()
    });
    Ok(found)
}

/// Modification time of an entry: the extended timestamp when present,
/// the MS-DOS time otherwise (read as UTC)
fn entry_modified<R: Read>(file: &ZipFile<'_, R>) -> SystemTime {
    let extended = file.extra_data_fields().find_map(|field| match field {
        ExtraField::ExtendedTimestamp(timestamp) => timestamp.mod_time(),
        _ => None,
    });
    if let Some(secs) = extended {
        return UNIX_EPOCH + Duration::from_secs(u64::from(secs));
    }

    file.last_modified()
        .and_then(|datetime| NaiveDateTime::try_from(datetime).ok())
        .map_or(UNIX_EPOCH, |naive| SystemTime::from(naive.and_utc()))
}

/// Index the archive appended to the file at `path`
pub fn load(path: &Path) -> Result<BoxRegistry, LocateError> {
    match AppendedArchive::open(path)? {
        Some(archive) => {
            debug!("found appended archive in {} ({} entries)", path.display(), archive.len());
            archive.index()
        }
        None => Ok(BoxRegistry::new()),
    }
}

/// Index the archive appended to the running executable
pub fn load_current_exe() -> Result<BoxRegistry, LocateError> {
    match current_executable() {
        Some(exe) => load(&exe),
        None => Ok(BoxRegistry::new()),
    }
}

/// Boxes appended to the running executable, indexed on first call.
///
/// Failures are logged and leave the registry empty.
pub fn appended_boxes() -> &'static BoxRegistry {
    APPENDED_BOXES.get_or_init(|| match load_current_exe() {
        Ok(registry) => registry,
        Err(err) => {
            warn!("ignoring appended boxes: {}", err);
            BoxRegistry::new()
        }
    })
}
