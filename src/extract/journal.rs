//! Export payload → journals.
//!
//! Accepts the three shapes an export can take: a single journal object, an
//! array of journal objects, or a folder-export manifest that lists journal
//! files next to it.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, warn};
use serde_json::Value;
use tempfile::TempDir;

use crate::error::{Error, Result};
use crate::normalize::normalize_title;

use super::assets::load_image_asset;
use super::model::{ContentBlock, Journal, Page, assign_page_keys};
use super::page::{UNTITLED, extract_page};

/// Title for a journal object without a name.
pub const DEFAULT_JOURNAL_TITLE: &str = "Journal";

/// Where an export payload came from.
///
/// Image references resolve against `asset_root`. Manifest entries resolve
/// against `base_dir`.
#[derive(Debug, Clone, Default)]
pub struct ExtractContext {
    pub asset_root: Option<PathBuf>,
    pub base_dir: Option<PathBuf>,
    /// Treat the payload as a manifest even without `type: folder-export`.
    pub manifest: bool,
    pub(crate) workdir: Option<Arc<TempDir>>,
}

impl ExtractContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_asset_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.asset_root = Some(root.into());
        self
    }

    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    pub fn as_manifest(mut self) -> Self {
        self.manifest = true;
        self
    }

    pub(crate) fn with_workdir(mut self, workdir: Arc<TempDir>) -> Self {
        self.workdir = Some(workdir);
        self
    }
}

/// Parse an export payload into journals.
pub fn extract_journals(payload: &Value, ctx: &ExtractContext) -> Result<Vec<Journal>> {
    if ctx.manifest || is_manifest(payload) {
        return extract_manifest(payload, ctx);
    }

    match payload {
        Value::Object(_) => Ok(vec![parse_journal(payload, ctx)?]),
        Value::Array(items) => items.iter().map(|item| parse_journal(item, ctx)).collect(),
        other => Err(Error::Parse(format!(
            "expected a journal object or array, found {}",
            value_kind(other)
        ))),
    }
}

/// Parse one journal object.
pub fn parse_journal(value: &Value, ctx: &ExtractContext) -> Result<Journal> {
    let obj = value
        .as_object()
        .ok_or_else(|| Error::Parse(format!("journal must be an object, found {}", value_kind(value))))?;

    let title = display_title(obj.get("name"), obj.get("title"))
        .unwrap_or_else(|| DEFAULT_JOURNAL_TITLE.to_string());

    let raw_pages = match obj.get("pages") {
        None | Some(Value::Null) => &[][..],
        Some(Value::Array(pages)) => pages.as_slice(),
        Some(other) => {
            return Err(Error::Parse(format!(
                "journal {title:?}: pages must be an array, found {}",
                value_kind(other)
            )));
        }
    };

    let mut pages = raw_pages
        .iter()
        .map(|raw| parse_page(raw, ctx))
        .collect::<Result<Vec<_>>>()?;
    // Stable: equal keys keep export order.
    pages.sort_by_key(|p| p.sort_key);
    assign_page_keys(&mut pages);

    debug!("Parsed journal {title:?} with {} pages", pages.len());

    Ok(Journal {
        title,
        pages,
        asset_root: ctx.asset_root.clone(),
        workdir: ctx.workdir.clone(),
    })
}

fn parse_page(value: &Value, ctx: &ExtractContext) -> Result<Page> {
    let obj = value
        .as_object()
        .ok_or_else(|| Error::Parse(format!("page must be an object, found {}", value_kind(value))))?;

    let title =
        display_title(obj.get("name"), obj.get("title")).unwrap_or_else(|| UNTITLED.to_string());

    let html = match obj.get("text") {
        Some(Value::Object(text)) => text.get("content").and_then(Value::as_str).unwrap_or(""),
        Some(Value::String(s)) => s.as_str(),
        _ => "",
    };

    let mut content = extract_page(html);
    let asset_root = ctx.asset_root.as_deref();
    for block in content
        .preface
        .iter_mut()
        .chain(content.headings.iter_mut().flat_map(|h| h.blocks.iter_mut()))
    {
        if let ContentBlock::Image(image) = block {
            load_image_asset(image, asset_root);
        }
    }

    Ok(Page::new(title, sort_key(obj.get("sort")), content))
}

fn sort_key(value: Option<&Value>) -> i64 {
    match value {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse::<f64>().map(|f| f as i64).unwrap_or(0),
        _ => 0,
    }
}

// ============================================================================
// Manifests
// ============================================================================

pub fn is_manifest(payload: &Value) -> bool {
    payload.get("type").and_then(Value::as_str) == Some("folder-export")
}

/// Journal files a manifest lists, relative paths joined to `base_dir`.
pub fn manifest_files(payload: &Value, base_dir: &Path) -> Vec<PathBuf> {
    let listed: Vec<PathBuf> = payload
        .get("journals")
        .and_then(Value::as_array)
        .map(|entries| entries.iter().filter_map(manifest_entry).collect())
        .unwrap_or_default();

    let listed: Vec<PathBuf> = listed.into_iter().map(|p| base_dir.join(p)).collect();
    if !listed.is_empty() {
        return listed;
    }

    let mut globbed: Vec<PathBuf> = fs::read_dir(base_dir.join("journals"))
        .into_iter()
        .flatten()
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.is_file()
                && p.extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
        })
        .collect();
    globbed.sort();
    globbed
}

fn manifest_entry(entry: &Value) -> Option<PathBuf> {
    match entry {
        Value::String(s) if !s.trim().is_empty() => Some(PathBuf::from(s.trim())),
        Value::Object(obj) => ["file", "path", "json", "href"]
            .iter()
            .filter_map(|key| obj.get(*key).and_then(Value::as_str))
            .find(|v| v.to_ascii_lowercase().ends_with(".json"))
            .map(PathBuf::from),
        _ => None,
    }
}

fn extract_manifest(payload: &Value, ctx: &ExtractContext) -> Result<Vec<Journal>> {
    let base_dir = ctx.base_dir.clone().unwrap_or_default();
    let files = manifest_files(payload, &base_dir);
    if files.is_empty() {
        return Err(Error::ManifestEmpty(base_dir));
    }

    let file_ctx = ExtractContext {
        manifest: false,
        ..ctx.clone()
    };

    let mut journals = Vec::new();
    for file in &files {
        match read_journal_file(file, &file_ctx) {
            Ok(mut parsed) => journals.append(&mut parsed),
            Err(e) => warn!("Skipping {}: {e}", file.display()),
        }
    }

    if journals.is_empty() {
        return Err(Error::ManifestEmpty(base_dir));
    }
    Ok(journals)
}

fn read_journal_file(path: &Path, ctx: &ExtractContext) -> Result<Vec<Journal>> {
    let text = fs::read_to_string(path)?;
    let payload: Value = serde_json::from_str(&text)?;
    if is_manifest(&payload) {
        return Err(Error::Parse("nested manifests are not supported".into()));
    }
    extract_journals(&payload, ctx)
}

// ============================================================================
// Helpers
// ============================================================================

/// First of `name`/`title` that is still non-empty after normalization.
fn display_title(name: Option<&Value>, title: Option<&Value>) -> Option<String> {
    [name, title]
        .into_iter()
        .filter_map(non_empty_str)
        .map(normalize_title)
        .find(|t| !t.is_empty())
}

fn non_empty_str(value: Option<&Value>) -> Option<&str> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
