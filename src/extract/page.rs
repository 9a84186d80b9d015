//! Page markup → preface and headings.
//!
//! Two passes, as with any flat document: walk the DOM emitting heading and
//! block events, then split the event stream at every heading.

use std::collections::HashMap;

use crate::dom::{ArenaDom, NodeId, Role};
use crate::normalize::{BOLD_CLOSE, BOLD_OPEN, collapse_whitespace, escape_markers, normalize_to_dom};

use super::model::{ContentBlock, Heading, ImageBlock, PageContent};

/// Title of the heading that holds a page without any heading tags.
pub const SYNTHETIC_HEADING: &str = "Content";
pub const UNTITLED: &str = "Untitled";

/// Attributes naming an image source, export-mapped paths first.
const IMAGE_SRC_ATTRS: &[&str] = &["data-export-src", "data-export-original-src", "data-src", "src"];

/// Extract the block structure of one page.
///
/// Never fails: the markup is parsed leniently and anything unrecognized is
/// read as text. Image blocks come back unresolved. Marker sequences already
/// present in the source are escaped so only real emphasis renders bold.
pub fn extract_page(html: &str) -> PageContent {
    let dom = normalize_to_dom(&escape_markers(html));
    let mut walker = Walker::new(&dom);
    walker.walk(dom.body());
    walker.flush();
    split_events(walker.events)
}

// ============================================================================
// Event collection (pass 1)
// ============================================================================

#[derive(Debug)]
enum Event {
    Heading { level: u8, title: String },
    Block(ContentBlock),
}

struct Walker<'a> {
    dom: &'a ArenaDom,
    events: Vec<Event>,
    /// Inline content seen between blocks.
    loose: Inline,
}

impl<'a> Walker<'a> {
    fn new(dom: &'a ArenaDom) -> Self {
        Self {
            dom,
            events: Vec::new(),
            loose: Inline::default(),
        }
    }

    fn walk(&mut self, parent: NodeId) {
        for child in self.dom.children(parent) {
            self.visit(child);
        }
    }

    fn visit(&mut self, id: NodeId) {
        let Some(role) = self.dom.role(id) else {
            if let Some(text) = self.dom.text_content(id) {
                self.loose.push_text(text);
            }
            return;
        };

        if !role.is_block() || role == Role::Image {
            self.loose.collect(self.dom, id);
            return;
        }

        self.flush();
        match role {
            Role::Heading(1) | Role::Paragraph | Role::ListItem => {
                let mut inline = Inline::default();
                inline.collect_children(self.dom, id);
                self.push_inline(inline);
            }

            Role::Heading(level) => {
                let mut inline = Inline::default();
                inline.collect_children(self.dom, id);
                let title = strip_bold(&inline.finish_text());
                let title = if title.is_empty() { UNTITLED.to_string() } else { title };
                self.events.push(Event::Heading { level, title });
                self.push_images(inline.images);
            }

            Role::List { ordered } => {
                let mut items = Vec::new();
                let mut images = Vec::new();
                collect_list_items(self.dom, id, &mut items, &mut images);
                if !items.is_empty() {
                    self.events.push(Event::Block(ContentBlock::List { ordered, items }));
                }
                self.push_images(images);
            }

            Role::Table => {
                let mut rows = Vec::new();
                let mut images = Vec::new();
                collect_rows(self.dom, id, &mut rows, &mut images);
                if !rows.is_empty() {
                    self.events.push(Event::Block(ContentBlock::Table { rows }));
                }
                self.push_images(images);
            }

            Role::Ignored => {}

            // Containers, and table parts found outside a table.
            _ => {
                self.walk(id);
                self.flush();
            }
        }
    }

    /// Close the current run of loose inline content.
    fn flush(&mut self) {
        let inline = std::mem::take(&mut self.loose);
        self.push_inline(inline);
    }

    fn push_inline(&mut self, inline: Inline) {
        let text = inline.finish_text();
        if !text.is_empty() {
            self.events.push(Event::Block(ContentBlock::Paragraph { text }));
        }
        self.push_images(inline.images);
    }

    fn push_images(&mut self, images: Vec<ImageBlock>) {
        self.events
            .extend(images.into_iter().map(|i| Event::Block(ContentBlock::Image(i))));
    }
}

// ============================================================================
// Splitting (pass 2)
// ============================================================================

fn split_events(events: Vec<Event>) -> PageContent {
    let mut preface = Vec::new();
    let mut headings: Vec<Heading> = Vec::new();
    let mut seen: HashMap<(u8, String), usize> = HashMap::new();

    for event in events {
        match event {
            Event::Heading { level, title } => {
                let count = seen.entry((level, title.clone())).or_insert(0);
                *count += 1;
                headings.push(Heading {
                    key: heading_key(level, &title, *count),
                    title,
                    level,
                    blocks: Vec::new(),
                });
            }
            Event::Block(block) => match headings.last_mut() {
                Some(heading) => heading.blocks.push(block),
                None => preface.push(block),
            },
        }
    }

    if headings.is_empty() {
        headings.push(Heading {
            title: SYNTHETIC_HEADING.to_string(),
            level: 2,
            key: heading_key(2, SYNTHETIC_HEADING, 1),
            blocks: std::mem::take(&mut preface),
        });
    }

    PageContent { preface, headings }
}

/// Selection key for the `occurrence`-th heading with this level and title.
pub fn heading_key(level: u8, title: &str, occurrence: usize) -> String {
    if occurrence <= 1 {
        format!("h{level}:{title}")
    } else {
        format!("h{level}:{title}#{occurrence}")
    }
}

// ============================================================================
// Inline text collection
// ============================================================================

/// Text of an inline run with bold markers, plus images found inside it.
#[derive(Default)]
struct Inline {
    text: String,
    images: Vec<ImageBlock>,
    bold_depth: usize,
}

impl Inline {
    fn push_text(&mut self, text: &str) {
        self.text.push_str(text);
    }

    fn collect_children(&mut self, dom: &ArenaDom, id: NodeId) {
        for child in dom.children(id) {
            self.collect(dom, child);
        }
    }

    fn collect(&mut self, dom: &ArenaDom, id: NodeId) {
        let Some(role) = dom.role(id) else {
            if let Some(text) = dom.text_content(id) {
                self.push_text(text);
            }
            return;
        };

        match role {
            Role::Image => {
                if let Some(image) = image_block(dom, id) {
                    self.images.push(image);
                }
            }
            Role::Break => self.text.push(' '),
            Role::Ignored => {}
            Role::Strong => {
                let outer = self.bold_depth == 0;
                if outer {
                    self.text.push_str(BOLD_OPEN);
                }
                self.bold_depth += 1;
                self.collect_children(dom, id);
                self.bold_depth -= 1;
                if outer {
                    self.text.push_str(BOLD_CLOSE);
                }
            }
            _ => {
                // Block content nested inside an inline run reads as text.
                if role.is_block() {
                    self.text.push(' ');
                }
                self.collect_children(dom, id);
                if role.is_block() {
                    self.text.push(' ');
                }
            }
        }
    }

    fn finish_text(&self) -> String {
        tidy_markers(&self.text)
    }
}

/// Collapse whitespace and keep bold markers tight around their text.
fn tidy_markers(text: &str) -> String {
    let mut s = collapse_whitespace(text);
    loop {
        let next = s
            .replace(&format!("{BOLD_OPEN} "), &format!(" {BOLD_OPEN}"))
            .replace(&format!(" {BOLD_CLOSE}"), &format!("{BOLD_CLOSE} "))
            .replace(&format!("{BOLD_OPEN}{BOLD_CLOSE}"), "");
        let next = collapse_whitespace(&next);
        if next == s {
            return s;
        }
        s = next;
    }
}

fn strip_bold(text: &str) -> String {
    collapse_whitespace(&text.replace(BOLD_OPEN, "").replace(BOLD_CLOSE, ""))
}

// ============================================================================
// Structured content
// ============================================================================

/// Gather `li` texts in document order. Nested items follow their parent.
fn collect_list_items(
    dom: &ArenaDom,
    list: NodeId,
    items: &mut Vec<String>,
    images: &mut Vec<ImageBlock>,
) {
    for child in dom.children(list) {
        match dom.role(child) {
            Some(Role::ListItem) => {
                let mut inline = Inline::default();
                let mut nested = Vec::new();
                collect_item_text(dom, child, &mut inline, &mut nested);
                let text = inline.finish_text();
                if !text.is_empty() {
                    items.push(text);
                }
                images.append(&mut inline.images);
                for sublist in nested {
                    collect_list_items(dom, sublist, items, images);
                }
            }
            Some(Role::List { .. }) | Some(Role::Container) => {
                collect_list_items(dom, child, items, images);
            }
            _ => {}
        }
    }
}

/// Text of one list item, setting nested lists aside.
fn collect_item_text(dom: &ArenaDom, id: NodeId, inline: &mut Inline, nested: &mut Vec<NodeId>) {
    for child in dom.children(id) {
        match dom.role(child) {
            Some(Role::List { .. }) => nested.push(child),
            Some(Role::Container) | Some(Role::Paragraph) => {
                inline.push_text(" ");
                collect_item_text(dom, child, inline, nested);
                inline.push_text(" ");
            }
            _ => inline.collect(dom, child),
        }
    }
}

/// Gather the rows of one table, skipping rows whose cells are all empty.
fn collect_rows(
    dom: &ArenaDom,
    parent: NodeId,
    rows: &mut Vec<Vec<String>>,
    images: &mut Vec<ImageBlock>,
) {
    for child in dom.children(parent) {
        match dom.role(child) {
            Some(Role::TableRow) => {
                let mut cells = Vec::new();
                for cell in dom.children(child) {
                    if dom.role(cell) != Some(Role::TableCell) {
                        continue;
                    }
                    let mut inline = Inline::default();
                    inline.collect_children(dom, cell);
                    cells.push(inline.finish_text());
                    images.append(&mut inline.images);
                }
                if cells.iter().any(|c| !c.is_empty()) {
                    rows.push(cells);
                }
            }
            // thead/tbody/tfoot
            Some(Role::Container) => collect_rows(dom, child, rows, images),
            _ => {}
        }
    }
}

fn image_block(dom: &ArenaDom, id: NodeId) -> Option<ImageBlock> {
    let src = IMAGE_SRC_ATTRS.iter().find_map(|attr| {
        dom.get_attr(id, attr)
            .map(str::trim)
            .filter(|v| !v.is_empty())
    })?;

    Some(ImageBlock {
        width_px: dom.get_attr(id, "width").and_then(parse_dimension),
        height_px: dom.get_attr(id, "height").and_then(parse_dimension),
        ..ImageBlock::new(src)
    })
}

/// Parse `"300"`, `"300.5"` or `"300px"`.
pub(crate) fn parse_dimension(value: &str) -> Option<f32> {
    let value = value.trim();
    let value = value.strip_suffix("px").unwrap_or(value).trim();
    value
        .parse::<f32>()
        .ok()
        .filter(|v| v.is_finite() && *v > 0.0)
}
