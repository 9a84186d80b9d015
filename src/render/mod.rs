//! Paginated PDF output.
//!
//! Rendering runs in two stages: elements are laid out into page-sized
//! lists of draw operations, then written as a PDF with lopdf. The table of
//! contents sits between the cover and the content, so its own length
//! shifts every page number it prints. It is laid out repeatedly until the
//! number of TOC pages stops changing.
//!
//! Page order: cover, table of contents, content.

mod images;
mod layout;
mod metrics;
mod pdf;
mod text;

use std::collections::HashMap;

use log::{debug, info, warn};

use crate::assemble::{Anchor, AssembledDocument};
use crate::error::Result;

pub use images::{EmbeddedImage, ImageRef, ImageStore};
pub use layout::{
    AnchorPosition, ContentLayout, DrawOp, LinkBox, LinkTarget, PageLayout, Rect, cover_page,
    layout_content, layout_toc, missing_image_text,
};
pub use metrics::{text_width, to_win_ansi};
pub use pdf::Destination;
pub use text::{Line, Span, parse_runs, strip_markers, wrap};

/// Page geometry and typography.
#[derive(Debug, Clone)]
pub struct RenderConfig {
    pub page_width: f32,
    pub page_height: f32,
    pub margin: f32,
    /// Body text size in points.
    pub font_size: f32,
    /// Line height as a multiple of the font size.
    pub line_height: f32,
    pub paragraph_spacing: f32,
    /// Cover and divider title size.
    pub title_size: f32,
    pub toc_title: String,
    pub back_link_text: String,
    /// Upper bound on TOC layout passes.
    pub max_passes: usize,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            page_width: 612.0,
            page_height: 792.0,
            margin: 54.0,
            font_size: 11.0,
            line_height: 1.35,
            paragraph_spacing: 6.0,
            title_size: 28.0,
            toc_title: "Table of Contents".to_string(),
            back_link_text: "Back to Table of Contents".to_string(),
            max_passes: 6,
        }
    }
}

impl RenderConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page_size(mut self, width: f32, height: f32) -> Self {
        self.page_width = width;
        self.page_height = height;
        self
    }

    pub fn with_margin(mut self, margin: f32) -> Self {
        self.margin = margin;
        self
    }

    pub fn with_font_size(mut self, size: f32) -> Self {
        self.font_size = size;
        self
    }

    pub fn with_toc_title(mut self, title: impl Into<String>) -> Self {
        self.toc_title = title.into();
        self
    }

    pub fn with_max_passes(mut self, passes: usize) -> Self {
        self.max_passes = passes.max(1);
        self
    }

    pub fn content_width(&self) -> f32 {
        self.page_width - 2.0 * self.margin
    }

    pub fn content_height(&self) -> f32 {
        self.page_height - 2.0 * self.margin
    }
}

/// What the renderer produced, for callers and tests.
#[derive(Debug, Clone)]
pub struct RenderReport {
    pub page_count: usize,
    pub toc_pages: usize,
    /// TOC layout passes until the page count settled.
    pub passes: usize,
    /// 1-based page number of every anchor.
    pub anchor_pages: HashMap<Anchor, usize>,
}

#[derive(Debug, Clone)]
pub struct RenderedPdf {
    pub bytes: Vec<u8>,
    pub report: RenderReport,
}

/// Render a document to PDF bytes.
pub fn render_pdf(doc: &AssembledDocument, config: &RenderConfig) -> Result<Vec<u8>> {
    Ok(render(doc, config)?.bytes)
}

/// Render a document and report how it was paginated.
pub fn render(doc: &AssembledDocument, config: &RenderConfig) -> Result<RenderedPdf> {
    let mut images = ImageStore::new();
    let content = layout_content(&doc.elements, &mut images, config);
    debug!(
        "Laid out {} content page(s), {} image(s)",
        content.pages.len(),
        images.len()
    );

    let mut toc_pages = 1;
    let mut passes = 0;
    let toc = loop {
        passes += 1;
        let numbers = page_numbers(&content, 1 + toc_pages);
        let toc = layout_toc(&doc.toc, &numbers, config);
        if toc.len() == toc_pages {
            break toc;
        }
        if passes >= config.max_passes {
            warn!(
                "Table of contents did not settle after {passes} passes; page numbers may be off"
            );
            break toc;
        }
        debug!("TOC needs {} page(s), not {toc_pages}; laying out again", toc.len());
        toc_pages = toc.len();
    };
    let toc_pages = toc.len();
    let content_start = 1 + toc_pages;

    let destinations: HashMap<Anchor, Destination> = content
        .anchors
        .iter()
        .map(|(anchor, pos)| {
            (
                anchor.clone(),
                Destination {
                    page: content_start + pos.page,
                    y: pos.y,
                },
            )
        })
        .collect();

    let mut pages = Vec::with_capacity(content_start + content.pages.len());
    pages.push(cover_page(&doc.title, config));
    pages.extend(toc);
    pages.extend(content.pages.iter().cloned());

    let bytes = pdf::write_pdf(
        &pdf::PdfInput {
            title: &doc.title,
            pages: &pages,
            destinations: &destinations,
            toc: &doc.toc,
            toc_page: 1,
            images: images.images(),
        },
        config,
    )?;

    info!(
        "Rendered {:?}: {} pages ({} TOC), {} bytes",
        doc.title,
        pages.len(),
        toc_pages,
        bytes.len()
    );

    Ok(RenderedPdf {
        bytes,
        report: RenderReport {
            page_count: pages.len(),
            toc_pages,
            passes,
            anchor_pages: page_numbers(&content, content_start),
        },
    })
}

/// 1-based page numbers when content starts after `offset` pages.
fn page_numbers(content: &ContentLayout, offset: usize) -> HashMap<Anchor, usize> {
    content
        .anchors
        .iter()
        .map(|(anchor, pos)| (anchor.clone(), offset + pos.page + 1))
        .collect()
}
