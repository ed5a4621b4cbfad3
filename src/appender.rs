//! Writer for box archives appended to executables
//!
//! Produces a plain zip archive whose directory entries carry the comment
//! `"dir"`, which is what [`crate::appended`] looks for. The zip crate's
//! writer cannot set per-entry comments, so the (small) subset of the
//! format needed here is written directly: local headers, central directory
//! and end record, deflate or stored, no zip64.
//!
//! Every entry carries the MS-DOS time (2 second resolution, 1980..=2107)
//! and an extended timestamp extra field with the exact Unix seconds, which
//! is what the reader prefers.

use crate::archive::{stored_seconds, DIR_COMMENT};
use crate::source::BoxSource;
use anyhow::{bail, Context, Result};
use chrono::{DateTime, Datelike, Utc};
use flate2::write::DeflateEncoder;
use flate2::Compression;
use log::debug;
use std::collections::HashSet;
use std::io::Write;
use std::path::Path;
use std::time::SystemTime;

const LOCAL_HEADER_SIGNATURE: u32 = 0x0403_4b50;
const CENTRAL_HEADER_SIGNATURE: u32 = 0x0201_4b50;
const END_RECORD_SIGNATURE: u32 = 0x0605_4b50;
const VERSION_NEEDED: u16 = 20;
const FLAG_UTF8: u16 = 1 << 11;
const METHOD_STORED: u16 = 0;
const METHOD_DEFLATED: u16 = 8;
const MSDOS_DIR_ATTRIBUTE: u32 = 0x10;
const EXTENDED_TIMESTAMP_ID: u16 = 0x5455;
// flags byte: modification time present
const EXTENDED_TIMESTAMP_MTIME: u8 = 0x01;
const EXTENDED_TIMESTAMP_LEN: u16 = 5;

/// One entry waiting to be written
#[derive(Debug, Clone)]
struct PendingEntry {
    name: String,
    comment: &'static str,
    method: u16,
    modified: zip::DateTime,
    unix_time: u32,
    crc32: u32,
    compressed: Vec<u8>,
    uncompressed_size: u32,
    is_dir: bool,
}

/// Collects box entries and writes them as a zip archive
#[derive(Debug, Clone)]
pub struct ArchiveWriter {
    entries: Vec<PendingEntry>,
    compress: bool,
}

impl ArchiveWriter {
    /// Create an empty writer that deflates file content
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            compress: true,
        }
    }

    /// Store file content uncompressed when `compress` is false
    pub fn with_compression(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Add a directory entry; a trailing `/` is appended when missing
    pub fn add_dir(&mut self, path: &str, modified: SystemTime) -> Result<()> {
        let mut name = path.to_string();
        if !name.ends_with('/') {
            name.push('/');
        }
        self.push(PendingEntry {
            name,
            comment: DIR_COMMENT,
            method: METHOD_STORED,
            modified: dos_datetime(modified),
            unix_time: stored_seconds(modified),
            crc32: 0,
            compressed: Vec::new(),
            uncompressed_size: 0,
            is_dir: true,
        })
    }

    /// Add a file entry with its full archive path (`box/relative/path`)
    pub fn add_file(&mut self, path: &str, modified: SystemTime, data: &[u8]) -> Result<()> {
        let uncompressed_size = u32::try_from(data.len())
            .with_context(|| format!("File {} is too large for a zip archive", path))?;

        let (method, compressed) = if self.compress && !data.is_empty() {
            let mut encoder = DeflateEncoder::new(Vec::new(), Compression::best());
            encoder.write_all(data)?;
            let deflated = encoder
                .finish()
                .with_context(|| format!("Failed to deflate {}", path))?;
            (METHOD_DEFLATED, deflated)
        } else {
            (METHOD_STORED, data.to_vec())
        };

        self.push(PendingEntry {
            name: path.to_string(),
            comment: "",
            method,
            modified: dos_datetime(modified),
            unix_time: stored_seconds(modified),
            crc32: crc32fast::hash(data),
            compressed,
            uncompressed_size,
            is_dir: false,
        })
    }

    /// Add a whole box: its root, directories and files (read from disk)
    pub fn add_box(&mut self, source: &BoxSource) -> Result<()> {
        let layout = source.layout()?;

        for dir in &layout.dirs {
            self.add_dir(&archive_path(&layout.name, &dir.path), dir.modified)?;
        }
        for file in &layout.files {
            let data = std::fs::read(&file.origin)
                .with_context(|| format!("Failed to read: {}", file.origin.display()))?;
            self.add_file(&archive_path(&layout.name, &file.path), file.modified, &data)?;
        }

        debug!(
            "added box {} ({} dirs, {} files)",
            layout.name,
            layout.dirs.len(),
            layout.files.len()
        );
        Ok(())
    }

    /// Write the archive. `base_offset` is the number of bytes already in
    /// front of it (the executable's length), so recorded offsets are absolute.
    pub fn write_to<W: Write>(&self, writer: &mut W, base_offset: u64) -> Result<()> {
        let mut offset = base_offset;
        let mut local_offsets = Vec::with_capacity(self.entries.len());

        for entry in &self.entries {
            local_offsets.push(to_u32(offset, "local header offset")?);
            let header = local_header(entry);
            writer.write_all(&header)?;
            writer.write_all(&entry.compressed)?;
            offset += (header.len() + entry.compressed.len()) as u64;
        }

        let central_start = offset;
        for (entry, local_offset) in self.entries.iter().zip(local_offsets) {
            let header = central_header(entry, local_offset);
            writer.write_all(&header)?;
            offset += header.len() as u64;
        }

        let count =
            u16::try_from(self.entries.len()).context("Too many entries for a zip archive")?;
        let mut end = Vec::with_capacity(22);
        put_u32(&mut end, END_RECORD_SIGNATURE);
        put_u16(&mut end, 0); // this disk
        put_u16(&mut end, 0); // central directory disk
        put_u16(&mut end, count);
        put_u16(&mut end, count);
        put_u32(&mut end, to_u32(offset - central_start, "central directory size")?);
        put_u32(&mut end, to_u32(central_start, "central directory offset")?);
        put_u16(&mut end, 0); // archive comment length
        writer.write_all(&end)?;

        Ok(())
    }

    fn push(&mut self, entry: PendingEntry) -> Result<()> {
        if entry.name.len() > u16::MAX as usize {
            bail!("Entry name too long: {}", entry.name);
        }
        self.entries.push(entry);
        Ok(())
    }
}

impl Default for ArchiveWriter {
    fn default() -> Self {
        Self::new()
    }
}

/// Append the given boxes to the executable at `executable`
pub fn append_boxes(executable: &Path, boxes: &[BoxSource]) -> Result<()> {
    let mut seen = HashSet::new();
    let mut writer = ArchiveWriter::new();
    for source in boxes {
        if !seen.insert(source.name.as_str()) {
            bail!("Duplicate box: {}", source.name);
        }
        writer.add_box(source)?;
    }

    let base_offset = std::fs::metadata(executable)
        .with_context(|| format!("Failed to stat: {}", executable.display()))?
        .len();

    // build the archive in memory so a failure leaves the executable untouched
    let mut archive = Vec::new();
    writer.write_to(&mut archive, base_offset)?;

    let mut file = std::fs::OpenOptions::new()
        .append(true)
        .open(executable)
        .with_context(|| format!("Failed to open for append: {}", executable.display()))?;
    file.write_all(&archive)
        .with_context(|| format!("Failed to append boxes to: {}", executable.display()))?;

    debug!(
        "appended {} boxes ({} bytes) to {}",
        boxes.len(),
        archive.len(),
        executable.display()
    );
    Ok(())
}

/// Archive path of a box-relative path (`""` is the box root)
fn archive_path(box_name: &str, path: &str) -> String {
    if path.is_empty() {
        box_name.to_string()
    } else {
        format!("{}/{}", box_name, path)
    }
}

fn local_header(entry: &PendingEntry) -> Vec<u8> {
    let extra = extended_timestamp(entry.unix_time);
    let mut header = Vec::with_capacity(30 + entry.name.len() + extra.len());
    put_u32(&mut header, LOCAL_HEADER_SIGNATURE);
    put_u16(&mut header, VERSION_NEEDED);
    put_u16(&mut header, FLAG_UTF8);
    put_u16(&mut header, entry.method);
    put_u16(&mut header, entry.modified.timepart());
    put_u16(&mut header, entry.modified.datepart());
    put_u32(&mut header, entry.crc32);
    put_u32(&mut header, entry.compressed.len() as u32);
    put_u32(&mut header, entry.uncompressed_size);
    put_u16(&mut header, entry.name.len() as u16);
    put_u16(&mut header, extra.len() as u16);
    header.extend_from_slice(entry.name.as_bytes());
    header.extend_from_slice(&extra);
    header
}

fn central_header(entry: &PendingEntry, local_offset: u32) -> Vec<u8> {
    let extra = extended_timestamp(entry.unix_time);
    let mut header =
        Vec::with_capacity(46 + entry.name.len() + extra.len() + entry.comment.len());
    put_u32(&mut header, CENTRAL_HEADER_SIGNATURE);
    put_u16(&mut header, VERSION_NEEDED); // version made by
    put_u16(&mut header, VERSION_NEEDED);
    put_u16(&mut header, FLAG_UTF8);
    put_u16(&mut header, entry.method);
    put_u16(&mut header, entry.modified.timepart());
    put_u16(&mut header, entry.modified.datepart());
    put_u32(&mut header, entry.crc32);
    put_u32(&mut header, entry.compressed.len() as u32);
    put_u32(&mut header, entry.uncompressed_size);
    put_u16(&mut header, entry.name.len() as u16);
    put_u16(&mut header, extra.len() as u16);
    put_u16(&mut header, entry.comment.len() as u16);
    put_u16(&mut header, 0); // disk number start
    put_u16(&mut header, 0); // internal attributes
    put_u32(&mut header, if entry.is_dir { MSDOS_DIR_ATTRIBUTE } else { 0 });
    put_u32(&mut header, local_offset);
    header.extend_from_slice(entry.name.as_bytes());
    header.extend_from_slice(&extra);
    header.extend_from_slice(entry.comment.as_bytes());
    header
}

/// Extended timestamp extra field holding only the modification time
fn extended_timestamp(unix_time: u32) -> Vec<u8> {
    let mut field = Vec::with_capacity(9);
    put_u16(&mut field, EXTENDED_TIMESTAMP_ID);
    put_u16(&mut field, EXTENDED_TIMESTAMP_LEN);
    field.push(EXTENDED_TIMESTAMP_MTIME);
    put_u32(&mut field, unix_time);
    field
}

/// MS-DOS date and time (UTC), clamped to 1980..=2107
fn dos_datetime(modified: SystemTime) -> zip::DateTime {
    let utc: DateTime<Utc> = modified.into();
    match zip::DateTime::try_from(utc.naive_utc()) {
        Ok(datetime) => datetime,
        Err(_) if utc.year() < 1980 => zip::DateTime::default(),
        Err(_) => zip::DateTime::from_date_and_time(2107, 12, 31, 23, 59, 58).unwrap_or_default(),
    }
}

fn to_u32(value: u64, what: &str) -> Result<u32> {
    u32::try_from(value).with_context(|| format!("Archive too large: {} exceeds 4 GiB", what))
}

fn put_u16(buf: &mut Vec<u8>, value: u16) {
    buf.extend_from_slice(&value.to_le_bytes());
}

fn put_u32(buf: &mut Vec<u8>, value: u32) {
    buf.extend_from_slice(&value.to_le_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::appended;
    use std::io::{Cursor, Read};
    use std::time::{Duration, UNIX_EPOCH};

    fn time(secs: u64) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(secs)
    }

    #[test]
    fn test_dos_datetime() {
        // 2023-11-14 22:13:21 UTC, stored with 2 second resolution
        let datetime = dos_datetime(time(1_700_000_001));
        assert_eq!(
            (datetime.year(), datetime.month(), datetime.day()),
            (2023, 11, 14)
        );
        assert_eq!(
            (datetime.hour(), datetime.minute(), datetime.second()),
            (22, 13, 20)
        );
    }

    #[test]
    fn test_dos_datetime_clamps_to_range() {
        assert_eq!(dos_datetime(UNIX_EPOCH), zip::DateTime::default());
        assert_eq!(dos_datetime(time(5_000_000_000)).year(), 2107);
    }

    #[test]
    fn test_extended_timestamp_field() {
        assert_eq!(
            extended_timestamp(1_700_000_001),
            vec![0x55, 0x54, 5, 0, 1, 0x01, 0xf1, 0x53, 0x65]
        );
    }

    #[test]
    fn test_readable_by_zip_crate() {
        let mut writer = ArchiveWriter::new();
        writer.add_dir("box/", time(1_700_000_000)).unwrap();
        writer.add_file("box/a.txt", time(1_700_000_000), b"aaaaaaaaaaaaaaaaaaaaaaaa").unwrap();

        let mut bytes = b"prefix".to_vec();
        writer.write_to(&mut bytes, 6).unwrap();

        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(archive.len(), 2);

        let dir = archive.by_index(0).unwrap();
        assert_eq!(dir.name(), "box/");
        assert_eq!(dir.comment(), "dir");
        drop(dir);

        let mut file = archive.by_index(1).unwrap();
        assert_eq!(file.compression(), zip::CompressionMethod::Deflated);
        let mut content = String::new();
        file.read_to_string(&mut content).unwrap();
        assert_eq!(content, "aaaaaaaaaaaaaaaaaaaaaaaa");
    }

    #[test]
    fn test_add_box_from_source() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("a")).unwrap();
        std::fs::write(dir.path().join("a/b.txt"), "bee").unwrap();

        let mut source = BoxSource::new("assets").with_modified(time(1_700_000_000));
        source.add_file("a/b.txt", time(1_700_000_000), dir.path().join("a/b.txt"));

        let mut writer = ArchiveWriter::new();
        writer.add_box(&source).unwrap();
        // root + synthesized "a" + file
        assert_eq!(writer.len(), 3);

        let mut bytes = Vec::new();
        writer.write_to(&mut bytes, 0).unwrap();
        let registry = appended::AppendedArchive::from_reader(Cursor::new(bytes))
            .unwrap()
            .unwrap()
            .index()
            .unwrap();
        let asset_box = registry.get("assets").unwrap();
        assert_eq!(asset_box.entry("a").unwrap().children(), &["a/b.txt".to_string()]);
        assert_eq!(asset_box.entry("a/b.txt").unwrap().bytes().unwrap(), b"bee");
    }

    #[test]
    fn test_append_boxes_to_executable() {
        let dir = tempfile::tempdir().unwrap();
        let exe = dir.path().join("app");
        std::fs::write(&exe, b"#!/bin/sh\necho original\n").unwrap();
        std::fs::write(dir.path().join("hello.txt"), "hello").unwrap();

        let mut source = BoxSource::new("greetings").with_modified(time(1_700_000_000));
        source.add_file("hello.txt", time(1_700_000_000), dir.path().join("hello.txt"));
        append_boxes(&exe, &[source]).unwrap();

        let bytes = std::fs::read(&exe).unwrap();
        assert!(bytes.starts_with(b"#!/bin/sh\necho original\n"));

        let registry = appended::load(&exe).unwrap();
        let asset_box = registry.get("greetings").unwrap();
        assert_eq!(asset_box.entry("hello.txt").unwrap().bytes().unwrap(), b"hello");
    }

    #[test]
    fn test_append_rejects_duplicate_boxes() {
        let dir = tempfile::tempdir().unwrap();
        let exe = dir.path().join("app");
        std::fs::write(&exe, b"binary").unwrap();

        let result = append_boxes(&exe, &[BoxSource::new("same"), BoxSource::new("same")]);
        assert!(result.unwrap_err().to_string().contains("Duplicate box"));
        assert_eq!(std::fs::read(&exe).unwrap(), b"binary");
    }

    #[test]
    fn test_append_missing_origin_leaves_executable_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let exe = dir.path().join("app");
        std::fs::write(&exe, b"binary").unwrap();

        let mut source = BoxSource::new("assets");
        source.add_file("gone.txt", time(1_700_000_000), dir.path().join("gone.txt"));
        assert!(append_boxes(&exe, &[source]).is_err());
        assert_eq!(std::fs::read(&exe).unwrap(), b"binary");
    }
}
