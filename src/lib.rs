//! # journal-pdf
//!
//! Turn tabletop journal exports into a single PDF with a clickable table of
//! contents.
//!
//! ## Features
//!
//! - Read journal JSON files, ZIP exports and folder exports with a manifest
//! - Normalize embedded inline macros and content links into bold labels
//! - Split each page into a preface and headed sections
//! - Select whole pages or single sections for export
//! - Paginate to PDF with bookmarks, TOC page numbers and back-links
//!
//! ## Quick Start
//!
//! ```no_run
//! use journal_pdf::{AssembleOptions, RenderConfig, Selection, assemble, load_export, render_pdf};
//!
//! let journals = load_export("bestiary.zip").unwrap();
//! let selection = Selection::all(&journals);
//! let document = assemble(&journals, &selection, &AssembleOptions::default()).unwrap();
//! let pdf = render_pdf(&document, &RenderConfig::default()).unwrap();
//! std::fs::write("bestiary.pdf", pdf).unwrap();
//! ```
//!
//! ## Selecting Sections
//!
//! Headings are addressed by the key [`extract_page`] gives them:
//!
//! ```
//! use journal_pdf::{Selection, SelectionEntry};
//!
//! let mut selection = Selection::new();
//! selection.insert("Bestiary::Wolf::h2:Stats".parse::<SelectionEntry>().unwrap());
//! assert!(selection.includes_heading("Bestiary", "Wolf", "h2:Stats"));
//! assert!(!selection.includes_page("Bestiary", "Wolf"));
//! ```

pub mod assemble;
pub mod build;
pub mod dom;
pub mod error;
pub mod extract;
pub mod normalize;
pub mod render;
pub mod selection;
pub mod source;

pub use assemble::{
    Anchor, AssembleOptions, AssembledDocument, DEFAULT_DOCUMENT_TITLE, Element, TocEntry,
    assemble,
};
pub use build::{BuildHandle, BuildOutcome, BuildRequest, Builder, build_pdf};
pub use error::{Error, Result};
pub use extract::{
    ContentBlock, ExtractContext, Heading, ImageAsset, ImageBlock, Journal, Page, PageContent,
    extract_journals, extract_page, resolve_asset,
};
pub use normalize::normalize_markup;
pub use render::{RenderConfig, RenderReport, RenderedPdf, render, render_pdf};
pub use selection::{Selection, SelectionEntry};
pub use source::{LoadFailure, LoadReport, dedupe_journal_titles, load_export, load_exports};
