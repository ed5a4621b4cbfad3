//! Source generator for embedded boxes
//!
//! Rendering happens in two stages:
//!
//! 1. A minijinja template renders the structure of the generated module.
//!    Every user-controlled string (box names, paths) is quoted as a Rust
//!    literal and then wrapped in an escaped tag, `{%unescape:...%}`. File
//!    content is never read here, only referenced as `{%inject:...%}`.
//! 2. A single pass over the skeleton replaces every tag with its final
//!    text: unescaped literals, or file content encoded by the configured
//!    [`ContentMode`]. Substituted text is never scanned again, so content
//!    that happens to contain tag delimiters cannot change the structure.

use crate::archive::{parent_key, stored_seconds};
use crate::codec::ContentMode;
use crate::escape::{escape, unescape};
use crate::source::{BoxLayout, BoxSource};
use anyhow::{anyhow, bail, Context, Result};
use minijinja::{context, AutoEscape, Environment, UndefinedBehavior};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::io::Write;
use std::path::Path;

const TEMPLATE_NAME: &str = "embedded_box.rs";
const TEMPLATE_SOURCE: &str = include_str!("templates/embedded_box.rs.j2");

const TAG_OPEN: &str = "{%";
const TAG_CLOSE: &str = "%}";
const UNESCAPE_TAG: &str = "unescape";
const INJECT_TAG: &str = "inject";

// Longest path fragment kept in a generated identifier
const MAX_SLUG_LEN: usize = 32;

/// Configuration for source generation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorConfig {
    /// How file content is written into the generated source
    pub mode: ContentMode,
    /// Path under which generated code reaches this crate
    pub crate_path: String,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            mode: ContentMode::Direct,
            crate_path: "::emx_assetbox".to_string(),
        }
    }
}

impl GeneratorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compress file content (zlib + Ascii85) instead of embedding it directly
    pub fn with_compression(mut self, compress: bool) -> Self {
        self.mode = ContentMode::from_compression(compress);
        self
    }

    /// Use a different path to this crate, e.g. when it is re-exported
    pub fn with_crate_path(mut self, crate_path: impl Into<String>) -> Self {
        self.crate_path = crate_path.into();
        self
    }
}

#[derive(Debug, Serialize)]
struct BoxView {
    ident: String,
    name: String,
    modified: u32,
    dirs: Vec<DirView>,
    files: Vec<FileView>,
}

#[derive(Debug, Serialize)]
struct DirView {
    ident: String,
    path: String,
    modified: u32,
    children: Vec<String>,
}

#[derive(Debug, Serialize)]
struct FileView {
    ident: String,
    path: String,
    modified: u32,
    origin: String,
}

/// Renders Rust source that rebuilds boxes from literal content
#[derive(Debug)]
pub struct Generator {
    config: GeneratorConfig,
    env: Environment<'static>,
}

impl Generator {
    /// Create a generator; fails if the built-in template does not parse
    pub fn new(config: GeneratorConfig) -> Result<Self> {
        let mut env = Environment::new();
        env.set_trim_blocks(true);
        env.set_lstrip_blocks(true);
        env.set_keep_trailing_newline(true);
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        env.set_auto_escape_callback(|_| AutoEscape::None);
        env.add_filter("rust_str", rust_str);
        env.add_filter("tagescape", tagescape);
        env.add_filter("injectfile", injectfile);
        env.add_template(TEMPLATE_NAME, TEMPLATE_SOURCE)
            .context("Failed to parse embedded box template")?;

        Ok(Self { config, env })
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Render one source unit registering all `boxes`
    pub fn render(&self, boxes: &[BoxSource]) -> Result<String> {
        let mut names = HashSet::new();
        let mut views = Vec::with_capacity(boxes.len());
        for (index, source) in boxes.iter().enumerate() {
            if !names.insert(source.name.as_str()) {
                bail!("Duplicate box name: {}", source.name);
            }
            let layout = source.layout()?;
            views.push(box_view(index, &layout)?);
        }

        let skeleton = self
            .env
            .get_template(TEMPLATE_NAME)?
            .render(context! {
                crate_path => &self.config.crate_path,
                compressed => self.config.mode.is_compressed(),
                boxes => &views,
            })
            .context("Failed to render embedded box template")?;

        let output = self.expand_tags(&skeleton)?;
        log::debug!(
            "Generated {} box(es), {} bytes of source ({:?} content)",
            boxes.len(),
            output.len(),
            self.config.mode
        );
        Ok(output)
    }

    /// Render and write the result to `writer`
    pub fn render_to_writer<W: Write>(&self, boxes: &[BoxSource], writer: &mut W) -> Result<()> {
        let output = self.render(boxes)?;
        writer
            .write_all(output.as_bytes())
            .context("Failed to write generated source")?;
        Ok(())
    }

    /// Render and write the result to `path`; nothing is written on failure
    pub fn generate_to_file(&self, boxes: &[BoxSource], path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let output = self.render(boxes)?;
        fs::write(path, output)
            .with_context(|| format!("Failed to write generated source: {}", path.display()))?;
        Ok(())
    }

    /// Replace every tag in `skeleton` with its final text
    fn expand_tags(&self, skeleton: &str) -> Result<String> {
        let mut output = String::with_capacity(skeleton.len());
        let mut rest = skeleton;

        while let Some(start) = rest.find(TAG_OPEN) {
            output.push_str(&rest[..start]);
            let body = &rest[start + TAG_OPEN.len()..];
            let end = body.find(TAG_CLOSE).ok_or_else(|| {
                anyhow!("Unterminated tag at byte {}", skeleton.len() - rest.len() + start)
            })?;
            self.expand_tag(&body[..end], &mut output)?;
            rest = &body[end + TAG_CLOSE.len()..];
        }
        output.push_str(rest);

        Ok(output)
    }

    fn expand_tag(&self, tag: &str, output: &mut String) -> Result<()> {
        match tag.split_once(':') {
            Some((UNESCAPE_TAG, text)) => output.push_str(&unescape(text)),
            Some((INJECT_TAG, origin)) => {
                let origin = unescape(origin);
                let bytes = fs::read(&origin)
                    .with_context(|| format!("Failed to read file to embed: {}", origin))?;
                let literal = self
                    .config
                    .mode
                    .literal(&bytes)
                    .with_context(|| format!("Failed to encode file: {}", origin))?;
                output.push_str(&literal);
            }
            _ => bail!("Unknown tag: {}{}{}", TAG_OPEN, tag, TAG_CLOSE),
        }
        Ok(())
    }
}

/// Quote a string as a Rust string literal
fn rust_str(value: String) -> String {
    format!("{:?}", value)
}

/// Wrap text so it survives stage 1 untouched and is restored in stage 2
fn tagescape(value: String) -> String {
    format!("{}{}:{}{}", TAG_OPEN, UNESCAPE_TAG, escape(&value), TAG_CLOSE)
}

/// Placeholder for the encoded content of the file at `origin`
fn injectfile(origin: String) -> String {
    format!("{}{}:{}{}", TAG_OPEN, INJECT_TAG, escape(&origin), TAG_CLOSE)
}

fn box_view(index: usize, layout: &BoxLayout) -> Result<BoxView> {
    let dir_idents: BTreeMap<&str, String> = layout
        .dirs
        .iter()
        .enumerate()
        .map(|(i, dir)| (dir.path.as_str(), format!("dir_{}_{}", i, slug(&dir.path))))
        .collect();

    // children are derived from paths, so discovery order does not matter
    let mut children: BTreeMap<&str, Vec<String>> = BTreeMap::new();
    for dir in layout.dirs.iter().filter(|dir| !dir.path.is_empty()) {
        children
            .entry(parent_key(&dir.path))
            .or_default()
            .push(dir_idents[dir.path.as_str()].clone());
    }

    let mut files = Vec::with_capacity(layout.files.len());
    for (i, file) in layout.files.iter().enumerate() {
        let ident = format!("file_{}_{}", i, slug(&file.path));
        children.entry(parent_key(&file.path)).or_default().push(ident.clone());

        let origin = file
            .origin
            .to_str()
            .with_context(|| format!("File path is not valid UTF-8: {}", file.origin.display()))?;
        files.push(FileView {
            ident,
            path: file.path.clone(),
            modified: stored_seconds(file.modified),
            origin: origin.to_string(),
        });
    }

    let dirs = layout
        .dirs
        .iter()
        .map(|dir| DirView {
            ident: dir_idents[dir.path.as_str()].clone(),
            path: dir.path.clone(),
            modified: stored_seconds(dir.modified),
            children: children.remove(dir.path.as_str()).unwrap_or_default(),
        })
        .collect();

    Ok(BoxView {
        ident: format!("box_{}_{}", index, slug(&layout.name)),
        name: layout.name.clone(),
        modified: stored_seconds(layout.modified),
        dirs,
        files,
    })
}

/// Identifier-safe fragment of `text`
fn slug(text: &str) -> String {
    let mut slug = String::with_capacity(MAX_SLUG_LEN);
    for c in text.chars() {
        if slug.len() >= MAX_SLUG_LEN {
            break;
        }
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('_') {
            slug.push('_');
        }
    }

    let slug = slug.trim_end_matches('_');
    if slug.is_empty() {
        "root".to_string()
    } else {
        slug.to_string()
    }
}
