//! Flow layout of elements into fixed-size pages.
//!
//! Coordinates here are in points with the origin at the top-left corner of
//! the page; the PDF writer flips them. Layout never touches the PDF object
//! graph, so the table of contents can be laid out again cheaply until its
//! page count settles.

use std::collections::HashMap;

use crate::assemble::{Anchor, Element, TocEntry};

use super::RenderConfig;
use super::images::{ImageRef, ImageStore};
use super::metrics::text_width;
use super::text::{Line, wrap};

pub type Color = [f32; 3];

pub const BLACK: Color = [0.0, 0.0, 0.0];
pub const LINK_BLUE: Color = [0.1, 0.2, 0.6];
const GRID_GRAY: Color = [0.55, 0.55, 0.55];

/// Baseline offset below the top of a line box, as a fraction of font size.
const ASCENT: f32 = 0.8;
const HEADING_SIZES: [f32; 4] = [20.0, 16.0, 13.0, 11.5];
const LIST_INDENT: f32 = 18.0;
const CELL_PADDING: f32 = 4.0;
const BACK_LINK_SIZE: f32 = 9.0;
/// Space reserved above and below content for the back-links.
pub const BACK_LINK_BAND: f32 = 18.0;
const TOC_INDENTS: [f32; 4] = [0.0, 18.0, 36.0, 54.0];
const TOC_HEADING_SIZE: f32 = 20.0;
/// Width kept free for the page number column.
const TOC_NUMBER_COLUMN: f32 = 36.0;

// ============================================================================
// Page Model
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    Text {
        x: f32,
        baseline: f32,
        size: f32,
        bold: bool,
        color: Color,
        text: String,
    },
    Line {
        from: (f32, f32),
        to: (f32, f32),
        width: f32,
        color: Color,
    },
    /// Stroked rectangle.
    Frame { rect: Rect, color: Color },
    Image { image: ImageRef, rect: Rect },
}

#[derive(Debug, Clone, PartialEq)]
pub enum LinkTarget {
    Anchor(Anchor),
    /// First page of the table of contents.
    TableOfContents,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LinkBox {
    pub rect: Rect,
    pub target: LinkTarget,
}

#[derive(Debug, Clone, Default)]
pub struct PageLayout {
    pub ops: Vec<DrawOp>,
    pub links: Vec<LinkBox>,
}

impl PageLayout {
    pub fn is_blank(&self) -> bool {
        self.ops.is_empty()
    }

    /// All text drawn on the page, one op per entry.
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.ops.iter().filter_map(|op| match op {
            DrawOp::Text { text, .. } => Some(text.as_str()),
            _ => None,
        })
    }
}

/// Where an anchor landed: page index within its section, top of its box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnchorPosition {
    pub page: usize,
    pub y: f32,
}

#[derive(Debug, Default)]
pub struct ContentLayout {
    pub pages: Vec<PageLayout>,
    pub anchors: HashMap<Anchor, AnchorPosition>,
}

// ============================================================================
// Flow
// ============================================================================

struct Flow<'a> {
    config: &'a RenderConfig,
    top: f32,
    bottom: f32,
    pages: Vec<PageLayout>,
    page: PageLayout,
    y: f32,
    anchors: HashMap<Anchor, AnchorPosition>,
}

impl<'a> Flow<'a> {
    fn new(config: &'a RenderConfig, top: f32, bottom: f32) -> Self {
        Self {
            config,
            top,
            bottom,
            pages: Vec::new(),
            page: PageLayout::default(),
            y: top,
            anchors: HashMap::new(),
        }
    }

    fn left(&self) -> f32 {
        self.config.margin
    }

    fn width(&self) -> f32 {
        self.config.content_width()
    }

    fn leading(&self, size: f32) -> f32 {
        size * self.config.line_height
    }

    fn at_top(&self) -> bool {
        self.page.is_blank()
    }

    fn break_page(&mut self) {
        self.pages.push(std::mem::take(&mut self.page));
        self.y = self.top;
    }

    /// Start a new page unless `height` fits below the cursor.
    fn ensure(&mut self, height: f32) {
        if !self.at_top() && self.y + height > self.bottom {
            self.break_page();
        }
    }

    fn gap(&mut self, height: f32) {
        if !self.at_top() {
            self.y += height;
        }
    }

    fn mark(&mut self, anchor: &Anchor) {
        self.anchors.insert(
            anchor.clone(),
            AnchorPosition {
                page: self.pages.len(),
                y: self.y,
            },
        );
    }

    /// Draw one wrapped line with its top at `top`.
    fn put_line(&mut self, line: &Line, x: f32, top: f32, size: f32, color: Color) {
        for span in &line.spans {
            self.page.ops.push(DrawOp::Text {
                x: x + span.x,
                baseline: top + size * ASCENT,
                size,
                bold: span.bold,
                color,
                text: span.text.clone(),
            });
        }
    }

    /// Draw lines, breaking pages between them as needed.
    fn flow_lines(&mut self, lines: &[Line], x: f32, size: f32) {
        let leading = self.leading(size);
        for line in lines {
            self.ensure(leading);
            let top = self.y;
            self.put_line(line, x, top, size, BLACK);
            self.y += leading;
        }
    }

    fn paragraph(&mut self, text: &str) {
        let size = self.config.font_size;
        let lines = wrap(text, size, self.width(), false);
        if lines.is_empty() {
            return;
        }
        self.flow_lines(&lines, self.left(), size);
        self.y += self.config.paragraph_spacing;
    }

    fn heading(&mut self, level: u8, text: &str, anchor: &Anchor) {
        let size = HEADING_SIZES[usize::from(level.min(3))];
        let lines = wrap(text, size, self.width(), true);
        let height = lines.len() as f32 * self.leading(size);
        let space_before = size * 0.6;

        // Keep the heading together with at least two body lines.
        let follow = 2.0 * self.leading(self.config.font_size);
        self.ensure(space_before + height + follow);
        self.gap(space_before);
        self.mark(anchor);

        let leading = self.leading(size);
        for line in &lines {
            let top = self.y;
            self.put_line(line, self.left(), top, size, BLACK);
            self.y += leading;
        }
        if level == 0 {
            let rule_y = self.y + 1.0;
            self.page.ops.push(DrawOp::Line {
                from: (self.left(), rule_y),
                to: (self.left() + self.width(), rule_y),
                width: 0.75,
                color: GRID_GRAY,
            });
        }
        self.y += size * 0.3;
    }

    /// Journal divider: the title alone on its page.
    fn title(&mut self, text: &str, anchor: &Anchor) {
        if !self.at_top() {
            self.break_page();
        }
        self.mark(anchor);
        let config = self.config;
        centered_title(&mut self.page, text, config);
    }

    fn list(&mut self, ordered: bool, items: &[String]) {
        let size = self.config.font_size;
        let leading = self.leading(size);
        let text_x = self.left() + LIST_INDENT;

        for (i, item) in items.iter().enumerate() {
            let lines = wrap(item, size, self.width() - LIST_INDENT, false);
            let marker = if ordered {
                format!("{}.", i + 1)
            } else {
                "\u{2022}".to_string()
            };
            let marker_x = (text_x - text_width(&marker, size, false) - 5.0).max(self.left());

            for (j, line) in lines.iter().enumerate() {
                self.ensure(leading);
                let top = self.y;
                if j == 0 {
                    self.page.ops.push(DrawOp::Text {
                        x: marker_x,
                        baseline: top + size * ASCENT,
                        size,
                        bold: false,
                        color: BLACK,
                        text: marker.clone(),
                    });
                }
                self.put_line(line, text_x, top, size, BLACK);
                self.y += leading;
            }
            self.y += size * 0.2;
        }
        self.y += self.config.paragraph_spacing;
    }

    fn table(&mut self, rows: &[Vec<String>]) {
        let columns = rows.iter().map(Vec::len).max().unwrap_or(0);
        if columns == 0 {
            return;
        }
        let size = self.config.font_size;
        let leading = self.leading(size);
        let column_width = self.width() / columns as f32;
        let text_width = (column_width - 2.0 * CELL_PADDING).max(1.0);
        let page_height = self.bottom - self.top;

        for row in rows {
            let cells: Vec<Vec<Line>> = (0..columns)
                .map(|c| {
                    row.get(c)
                        .map(|text| wrap(text, size, text_width, false))
                        .unwrap_or_default()
                })
                .collect();
            let total = cells.iter().map(Vec::len).max().unwrap_or(0).max(1);
            let full_height = total as f32 * leading + 2.0 * CELL_PADDING;

            // Rows that fit on a page are never split.
            if full_height <= page_height {
                self.ensure(full_height);
            }

            let mut start = 0;
            loop {
                self.ensure(leading + 2.0 * CELL_PADDING);
                let available = self.bottom - self.y - 2.0 * CELL_PADDING;
                let fit = ((available / leading).floor() as usize).max(1);
                let end = (start + fit).min(total);
                let height = (end - start) as f32 * leading + 2.0 * CELL_PADDING;
                let top = self.y;

                for (c, lines) in cells.iter().enumerate() {
                    let x = self.left() + c as f32 * column_width;
                    self.page.ops.push(DrawOp::Frame {
                        rect: Rect {
                            x,
                            y: top,
                            width: column_width,
                            height,
                        },
                        color: GRID_GRAY,
                    });
                    let mut line_top = top + CELL_PADDING;
                    for line in lines.iter().take(end).skip(start) {
                        self.put_line(line, x + CELL_PADDING, line_top, size, BLACK);
                        line_top += leading;
                    }
                }

                self.y += height;
                if end >= total {
                    break;
                }
                start = end;
                self.break_page();
            }
        }
        self.y += self.config.paragraph_spacing;
    }

    fn image(&mut self, image: ImageRef, hint_width: Option<f32>, hint_height: Option<f32>) {
        let (width, height) = image_size(image, hint_width, hint_height, self.config);
        self.ensure(height);
        let x = self.left() + (self.width() - width) / 2.0;
        self.page.ops.push(DrawOp::Image {
            image,
            rect: Rect {
                x,
                y: self.y,
                width,
                height,
            },
        });
        self.y += height + self.config.paragraph_spacing;
    }

    fn finish(mut self) -> (Vec<PageLayout>, HashMap<Anchor, AnchorPosition>) {
        if !self.page.is_blank() || self.pages.is_empty() {
            self.pages.push(self.page);
        }
        (self.pages, self.anchors)
    }
}

/// Scale pixel hints (CSS px at 96 dpi) to points, keep the aspect ratio,
/// and fit within the content width and 85% of the content height.
fn image_size(
    image: ImageRef,
    hint_width: Option<f32>,
    hint_height: Option<f32>,
    config: &RenderConfig,
) -> (f32, f32) {
    let natural_w = image.width.max(1) as f32;
    let natural_h = image.height.max(1) as f32;
    let aspect = natural_h / natural_w;

    let (width, height) = match (hint_width, hint_height) {
        (Some(w), _) => (w * 0.75, w * 0.75 * aspect),
        (None, Some(h)) => (h * 0.75 / aspect, h * 0.75),
        (None, None) => (natural_w * 0.75, natural_h * 0.75),
    };

    let max_width = config.content_width();
    let max_height = config.content_height() * 0.85;
    let scale = (max_width / width).min(max_height / height).min(1.0);
    (width * scale, height * scale)
}

fn centered_title(page: &mut PageLayout, text: &str, config: &RenderConfig) {
    let size = config.title_size;
    let leading = size * config.line_height;
    let lines = wrap(text, size, config.content_width(), true);
    let mut top = config.page_height * 0.35;
    for line in &lines {
        let x = config.margin + (config.content_width() - line.width) / 2.0;
        for span in &line.spans {
            page.ops.push(DrawOp::Text {
                x: x + span.x,
                baseline: top + size * ASCENT,
                size,
                bold: true,
                color: BLACK,
                text: span.text.clone(),
            });
        }
        top += leading;
    }
}

fn add_back_links(page: &mut PageLayout, config: &RenderConfig) {
    let text = &config.back_link_text;
    let width = text_width(text, BACK_LINK_SIZE, false);
    let tops = [
        config.margin,
        config.page_height - config.margin - BACK_LINK_SIZE,
    ];
    for top in tops {
        page.ops.push(DrawOp::Text {
            x: config.margin,
            baseline: top + BACK_LINK_SIZE * ASCENT,
            size: BACK_LINK_SIZE,
            bold: false,
            color: LINK_BLUE,
            text: text.clone(),
        });
        page.links.push(LinkBox {
            rect: Rect {
                x: config.margin,
                y: top,
                width,
                height: BACK_LINK_SIZE,
            },
            target: LinkTarget::TableOfContents,
        });
    }
}

// ============================================================================
// Entry Points
// ============================================================================

/// The cover page.
pub fn cover_page(title: &str, config: &RenderConfig) -> PageLayout {
    let mut page = PageLayout::default();
    centered_title(&mut page, title, config);
    page
}

/// Lay out the document body. Anchor pages are relative to the first
/// content page. Every page carries back-links to the table of contents.
pub fn layout_content(
    elements: &[Element],
    images: &mut ImageStore,
    config: &RenderConfig,
) -> ContentLayout {
    let mut flow = Flow::new(
        config,
        config.margin + BACK_LINK_BAND,
        config.page_height - config.margin - BACK_LINK_BAND,
    );

    for element in elements {
        match element {
            Element::Title { text, anchor } => flow.title(text, anchor),
            Element::Heading {
                level,
                text,
                anchor,
            } => flow.heading(*level, text, anchor),
            Element::Paragraph { text } => flow.paragraph(text),
            Element::List { ordered, items } => flow.list(*ordered, items),
            Element::Table { rows } => flow.table(rows),
            Element::Image(block) => match images.load(block) {
                Some(image) => flow.image(image, block.width_px, block.height_px),
                None => flow.paragraph(&missing_image_text(&block.src)),
            },
            Element::MissingImage { src } => flow.paragraph(&missing_image_text(src)),
            Element::PageBreak => {
                if !flow.at_top() {
                    flow.break_page();
                }
            }
        }
    }

    let (mut pages, anchors) = flow.finish();
    for page in &mut pages {
        add_back_links(page, config);
    }
    ContentLayout { pages, anchors }
}

pub fn missing_image_text(src: &str) -> String {
    format!("[Missing image: {src}]")
}

/// Lay out the table of contents. `page_numbers` maps anchors to the
/// 1-based page numbers printed beside each entry.
pub fn layout_toc(
    entries: &[TocEntry],
    page_numbers: &HashMap<Anchor, usize>,
    config: &RenderConfig,
) -> Vec<PageLayout> {
    let mut flow = Flow::new(config, config.margin, config.page_height - config.margin);
    let left = flow.left();
    let right = left + flow.width();

    let heading = wrap(&config.toc_title, TOC_HEADING_SIZE, flow.width(), true);
    let heading_leading = flow.leading(TOC_HEADING_SIZE);
    for line in &heading {
        let top = flow.y;
        flow.put_line(line, left, top, TOC_HEADING_SIZE, BLACK);
        flow.y += heading_leading;
    }
    flow.y += 8.0;

    let size = config.font_size;
    let leading = flow.leading(size);
    let dot_width = text_width(".", size, false);

    for entry in entries {
        let level = usize::from(entry.level.min(3));
        let indent = TOC_INDENTS[level];
        let bold = level == 0;
        let number = page_numbers
            .get(&entry.anchor)
            .map(ToString::to_string)
            .unwrap_or_default();
        let number_width = text_width(&number, size, false);

        let mut lines = wrap(&entry.text, size, flow.width() - indent - TOC_NUMBER_COLUMN, bold);
        if lines.is_empty() {
            lines.push(Line::default());
        }
        let height = lines.len() as f32 * leading;

        if level == 0 {
            flow.gap(4.0);
        }
        flow.ensure(height);
        let top = flow.y;
        let x = left + indent;

        for line in &lines {
            let line_top = flow.y;
            flow.put_line(line, x, line_top, size, BLACK);
            flow.y += leading;
        }

        let last_top = flow.y - leading;
        let baseline = last_top + size * ASCENT;
        let last_width = lines.last().map_or(0.0, |l| l.width);
        let leader_start = x + last_width + 4.0;
        let leader_end = right - number_width - 4.0;
        let dots = ((leader_end - leader_start) / dot_width).floor();
        if dots > 0.0 {
            flow.page.ops.push(DrawOp::Text {
                x: leader_end - dots * dot_width,
                baseline,
                size,
                bold: false,
                color: BLACK,
                text: ".".repeat(dots as usize),
            });
        }
        flow.page.ops.push(DrawOp::Text {
            x: right - number_width,
            baseline,
            size,
            bold: false,
            color: BLACK,
            text: number,
        });
        flow.page.links.push(LinkBox {
            rect: Rect {
                x,
                y: top,
                width: right - x,
                height,
            },
            target: LinkTarget::Anchor(entry.anchor.clone()),
        });
    }

    flow.finish().0
}
