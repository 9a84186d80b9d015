//! The journal tree produced by extraction.
//!
//! Everything here is immutable once built. Image bytes are loaded while the
//! tree is constructed, so later stages never touch the filesystem.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use tempfile::TempDir;

// ============================================================================
// Journals and pages
// ============================================================================

/// One exported journal: a titled, ordered list of pages.
#[derive(Debug, Clone, Serialize)]
pub struct Journal {
    pub title: String,
    pub pages: Vec<Page>,
    /// Directory image references were resolved against.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset_root: Option<PathBuf>,
    /// Keeps an archive's extraction directory alive as long as the journal.
    #[serde(skip)]
    pub(crate) workdir: Option<Arc<TempDir>>,
}

impl Journal {
    /// Build a journal from ordered pages, assigning their keys.
    pub fn new(title: impl Into<String>, mut pages: Vec<Page>) -> Self {
        assign_page_keys(&mut pages);
        Self {
            title: title.into(),
            pages,
            asset_root: None,
            workdir: None,
        }
    }

    /// Look up a page by its key.
    pub fn page(&self, key: &str) -> Option<&Page> {
        self.pages.iter().find(|p| p.key == key)
    }
}

/// Key pages by title in order, suffixing `#n` on the n-th repeat.
pub(crate) fn assign_page_keys(pages: &mut [Page]) {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for page in pages {
        let n = counts.entry(page.title.clone()).or_insert(0);
        *n += 1;
        page.key = if *n == 1 {
            page.title.clone()
        } else {
            format!("{}#{n}", page.title)
        };
    }
}

/// A titled unit of content within a journal.
#[derive(Debug, Clone, Serialize)]
pub struct Page {
    pub title: String,
    /// Key used by selections: the title, plus `#n` when an earlier page of
    /// the journal has the same title.
    pub key: String,
    /// Only used to order pages when the journal is built.
    pub sort_key: i64,
    /// Content before the first heading.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub preface: Vec<ContentBlock>,
    pub headings: Vec<Heading>,
}

impl Page {
    pub fn new(title: impl Into<String>, sort_key: i64, content: PageContent) -> Self {
        let title = title.into();
        Self {
            key: title.clone(),
            title,
            sort_key,
            preface: content.preface,
            headings: content.headings,
        }
    }

    pub fn heading(&self, key: &str) -> Option<&Heading> {
        self.headings.iter().find(|h| h.key == key)
    }
}

/// A titled subsection of a page.
#[derive(Debug, Clone, Serialize)]
pub struct Heading {
    pub title: String,
    /// Source heading level, 2 through 6.
    pub level: u8,
    /// Stable key used by selections: `h{level}:{title}`, plus `#n` on repeats.
    pub key: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub blocks: Vec<ContentBlock>,
}

/// Output of page extraction.
#[derive(Debug, Clone, Default)]
pub struct PageContent {
    pub preface: Vec<ContentBlock>,
    pub headings: Vec<Heading>,
}

// ============================================================================
// Content blocks
// ============================================================================

/// An atomic piece of page content.
///
/// Text may contain `[[B]]`/`[[/B]]` bold markers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Paragraph {
        text: String,
    },
    List {
        ordered: bool,
        items: Vec<String>,
    },
    Table {
        rows: Vec<Vec<String>>,
    },
    Image(ImageBlock),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageBlock {
    /// Reference as written in the markup.
    pub src: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width_px: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height_px: Option<f32>,
    /// `None` when the reference could not be resolved to a file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset: Option<ImageAsset>,
}

impl ImageBlock {
    pub fn new(src: impl Into<String>) -> Self {
        Self {
            src: src.into(),
            width_px: None,
            height_px: None,
            asset: None,
        }
    }
}

/// A resolved image file and its raw bytes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageAsset {
    pub path: PathBuf,
    #[serde(skip)]
    pub bytes: Arc<Vec<u8>>,
}
