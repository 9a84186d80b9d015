//! Journals + selection → flat element sequence with TOC entries.
//!
//! The output is still abstract: no page numbers, just anchors. The renderer
//! joins TOC entries to pages by anchor, so every anchor here is unique and
//! derived only from the document structure.

use std::collections::{HashMap, HashSet};
use std::fmt;

use log::debug;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::extract::{ContentBlock, Heading, ImageBlock, Journal, Page};
use crate::selection::Selection;

/// Title used when several journals share one document.
pub const DEFAULT_DOCUMENT_TITLE: &str = "Journals";

// ============================================================================
// Public Types
// ============================================================================

/// Stable identifier of a titled element.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Anchor(String);

impl Anchor {
    /// `sec-` plus the first 12 hex digits of the SHA-1 of `path`.
    pub fn from_path(path: &str) -> Self {
        let digest = sha1_smol::Sha1::from(path).hexdigest();
        Anchor(format!("sec-{}", &digest[..12]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Anchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One entry of the table of contents.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TocEntry {
    /// Nesting depth, 0 through 3.
    pub level: u8,
    pub text: String,
    pub anchor: Anchor,
}

/// A layout-ready element.
#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    /// Journal divider title, alone on its page.
    Title { text: String, anchor: Anchor },
    Heading { level: u8, text: String, anchor: Anchor },
    Paragraph { text: String },
    List { ordered: bool, items: Vec<String> },
    Table { rows: Vec<Vec<String>> },
    /// An image with loaded bytes.
    Image(ImageBlock),
    /// An image whose file could not be found.
    MissingImage { src: String },
    PageBreak,
}

impl Element {
    pub fn anchor(&self) -> Option<&Anchor> {
        match self {
            Element::Title { anchor, .. } | Element::Heading { anchor, .. } => Some(anchor),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AssembledDocument {
    pub title: String,
    pub elements: Vec<Element>,
    pub toc: Vec<TocEntry>,
}

/// Assembly settings.
#[derive(Debug, Clone)]
pub struct AssembleOptions {
    /// Document title. Defaults to the journal title, or a generic one.
    pub title: Option<String>,
    /// Start each journal on its own title page when several are included.
    pub divider_pages: bool,
}

impl Default for AssembleOptions {
    fn default() -> Self {
        Self {
            title: None,
            divider_pages: true,
        }
    }
}

impl AssembleOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into()).filter(|t: &String| !t.trim().is_empty());
        self
    }

    pub fn with_divider_pages(mut self, enabled: bool) -> Self {
        self.divider_pages = enabled;
        self
    }
}

// ============================================================================
// Assembly
// ============================================================================

/// A page that survived selection, with the parts to emit.
struct PagePlan<'a> {
    page: &'a Page,
    with_preface: bool,
    headings: Vec<&'a Heading>,
}

/// Build the element sequence for the selected content.
pub fn assemble(
    journals: &[Journal],
    selection: &Selection,
    options: &AssembleOptions,
) -> Result<AssembledDocument> {
    if selection.is_empty() {
        return Err(Error::EmptySelection);
    }

    let plan: Vec<(&Journal, Vec<PagePlan>)> = journals
        .iter()
        .filter(|j| selection.names_journal(&j.title))
        .map(|j| (j, plan_pages(j, selection)))
        .filter(|(_, pages)| !pages.is_empty())
        .collect();

    let multi = plan.len() > 1;
    let page_level = if multi { 1 } else { 0 };

    let mut out = Builder::default();
    let mut journal_counts: HashMap<&str, usize> = HashMap::new();

    for (journal, pages) in &plan {
        let journal_path = occurrence_path(
            &mut journal_counts,
            &journal.title,
            format!("journal/{}", journal.title),
        );

        if multi {
            let anchor = out.anchor(&journal_path);
            out.toc(0, &journal.title, &anchor);
            if options.divider_pages {
                out.push(Element::Title {
                    text: journal.title.clone(),
                    anchor,
                });
                out.push(Element::PageBreak);
            } else {
                out.push(Element::Heading {
                    level: 0,
                    text: journal.title.clone(),
                    anchor,
                });
            }
        }

        for page_plan in pages {
            let page = page_plan.page;
            let page_path = format!("{journal_path}/page/{}", page.key);

            out.heading(page_level, &page.title, &page_path);
            if page_plan.with_preface {
                out.blocks(&page.preface);
            }
            for heading in &page_plan.headings {
                let level = heading.level.clamp(2, 3);
                out.heading(level, &heading.title, &format!("{page_path}/{}", heading.key));
                out.blocks(&heading.blocks);
            }
            out.push(Element::PageBreak);
        }
    }

    if out.elements.is_empty() {
        return Err(Error::EmptySelection);
    }

    let title = options
        .title
        .clone()
        .or_else(|| match plan.as_slice() {
            [(journal, _)] => Some(journal.title.clone()),
            _ => None,
        })
        .unwrap_or_else(|| DEFAULT_DOCUMENT_TITLE.to_string());

    debug!(
        "Assembled {:?}: {} elements, {} TOC entries",
        title,
        out.elements.len(),
        out.toc.len()
    );

    Ok(AssembledDocument {
        title,
        elements: out.elements,
        toc: out.toc,
    })
}

fn plan_pages<'a>(journal: &'a Journal, selection: &Selection) -> Vec<PagePlan<'a>> {
    journal
        .pages
        .iter()
        .filter_map(|page| {
            if selection.includes_page(&journal.title, &page.key) {
                return Some(PagePlan {
                    page,
                    with_preface: true,
                    headings: page.headings.iter().collect(),
                });
            }
            let headings: Vec<&Heading> = page
                .headings
                .iter()
                .filter(|h| selection.includes_heading(&journal.title, &page.key, &h.key))
                .collect();
            (!headings.is_empty()).then_some(PagePlan {
                page,
                with_preface: false,
                headings,
            })
        })
        .collect()
}

/// `base`, suffixed with `#n` for the n-th repeat of `title`.
fn occurrence_path<'a>(counts: &mut HashMap<&'a str, usize>, title: &'a str, base: String) -> String {
    let n = counts.entry(title).or_insert(0);
    *n += 1;
    if *n == 1 { base } else { format!("{base}#{n}") }
}

#[derive(Default)]
struct Builder {
    elements: Vec<Element>,
    toc: Vec<TocEntry>,
    anchors: HashSet<Anchor>,
}

impl Builder {
    fn push(&mut self, element: Element) {
        self.elements.push(element);
    }

    fn anchor(&mut self, path: &str) -> Anchor {
        let mut anchor = Anchor::from_path(path);
        let mut salt = 1;
        // Only reachable on a truncated-hash collision.
        while self.anchors.contains(&anchor) {
            salt += 1;
            anchor = Anchor::from_path(&format!("{path}~{salt}"));
        }
        self.anchors.insert(anchor.clone());
        anchor
    }

    fn toc(&mut self, level: u8, text: &str, anchor: &Anchor) {
        self.toc.push(TocEntry {
            level,
            text: text.to_string(),
            anchor: anchor.clone(),
        });
    }

    fn heading(&mut self, level: u8, text: &str, path: &str) {
        let anchor = self.anchor(path);
        self.toc(level, text, &anchor);
        self.push(Element::Heading {
            level,
            text: text.to_string(),
            anchor,
        });
    }

    fn blocks(&mut self, blocks: &[ContentBlock]) {
        for block in blocks {
            let element = match block {
                ContentBlock::Paragraph { text } => Element::Paragraph { text: text.clone() },
                ContentBlock::List { ordered, items } => Element::List {
                    ordered: *ordered,
                    items: items.clone(),
                },
                ContentBlock::Table { rows } => Element::Table { rows: rows.clone() },
                ContentBlock::Image(image) if image.asset.is_some() => Element::Image(image.clone()),
                ContentBlock::Image(image) => Element::MissingImage {
                    src: image.src.clone(),
                },
            };
            self.push(element);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::extract_page;
    use crate::selection::SelectionEntry;

    fn page(title: &str, html: &str) -> Page {
        let content = extract_page(html);
        Page::new(title, 0, content)
    }

    fn bestiary() -> Journal {
        Journal::new(
            "Bestiary",
            vec![
                page("Wolf", "<p>A canine.</p><h2>Stats</h2><p>HP 11</p><h3>Tactics</h3><p>Pack</p>"),
                page("Bear", "<h2>Stats</h2><p>HP 34</p>"),
            ],
        )
    }

    fn atlas() -> Journal {
        Journal::new("Atlas", vec![page("Cave", "<h2>Map</h2><p>dark</p>")])
    }

    fn select(entries: &[SelectionEntry]) -> Selection {
        entries.iter().cloned().collect()
    }

    fn texts(doc: &AssembledDocument) -> Vec<String> {
        doc.elements
            .iter()
            .map(|e| match e {
                Element::Title { text, .. } => format!("title:{text}"),
                Element::Heading { level, text, .. } => format!("h{level}:{text}"),
                Element::Paragraph { text } => format!("p:{text}"),
                Element::PageBreak => "break".into(),
                other => format!("{other:?}"),
            })
            .collect()
    }

    #[test]
    fn test_bestiary_heading_only() {
        let doc = assemble(
            &[bestiary()],
            &select(&[SelectionEntry::heading("Bestiary", "Wolf", "h2:Stats")]),
            &AssembleOptions::default(),
        )
        .unwrap();

        assert_eq!(texts(&doc), vec!["h0:Wolf", "h2:Stats", "p:HP 11", "break"]);
        assert_eq!(doc.title, "Bestiary");
        assert_eq!(doc.toc.len(), 2);
    }

    #[test]
    fn test_whole_page_includes_preface() {
        let doc = assemble(
            &[bestiary()],
            &select(&[
                SelectionEntry::whole_page("Bestiary", "Wolf"),
                SelectionEntry::heading("Bestiary", "Wolf", "h2:Stats"),
            ]),
            &AssembleOptions::default(),
        )
        .unwrap();

        assert_eq!(
            texts(&doc),
            vec![
                "h0:Wolf",
                "p:A canine.",
                "h2:Stats",
                "p:HP 11",
                "h3:Tactics",
                "p:Pack",
                "break"
            ]
        );
    }

    #[test]
    fn test_heading_order_follows_document() {
        let doc = assemble(
            &[bestiary()],
            &select(&[
                SelectionEntry::heading("Bestiary", "Wolf", "h3:Tactics"),
                SelectionEntry::heading("Bestiary", "Wolf", "h2:Stats"),
            ]),
            &AssembleOptions::default(),
        )
        .unwrap();

        let headings: Vec<_> = doc.toc.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(headings, vec!["Wolf", "Stats", "Tactics"]);
    }

    #[test]
    fn test_multi_journal_with_dividers() {
        let doc = assemble(
            &[bestiary(), atlas()],
            &select(&[
                SelectionEntry::whole_page("Bestiary", "Bear"),
                SelectionEntry::whole_page("Atlas", "Cave"),
            ]),
            &AssembleOptions::default(),
        )
        .unwrap();

        assert_eq!(
            texts(&doc),
            vec![
                "title:Bestiary",
                "break",
                "h1:Bear",
                "h2:Stats",
                "p:HP 34",
                "break",
                "title:Atlas",
                "break",
                "h1:Cave",
                "h2:Map",
                "p:dark",
                "break"
            ]
        );
        assert_eq!(doc.title, "Journals");
        let levels: Vec<_> = doc.toc.iter().map(|t| t.level).collect();
        assert_eq!(levels, vec![0, 1, 2, 0, 1, 2]);
    }

    #[test]
    fn test_multi_journal_without_dividers() {
        let doc = assemble(
            &[bestiary(), atlas()],
            &select(&[
                SelectionEntry::whole_page("Bestiary", "Bear"),
                SelectionEntry::whole_page("Atlas", "Cave"),
            ]),
            &AssembleOptions::new()
                .with_divider_pages(false)
                .with_title("Campaign"),
        )
        .unwrap();

        assert_eq!(&texts(&doc)[..2], &["h0:Bestiary", "h1:Bear"]);
        assert!(!doc.elements.iter().any(|e| matches!(e, Element::Title { .. })));
        assert_eq!(doc.title, "Campaign");
    }

    #[test]
    fn test_unnamed_journal_skipped() {
        let doc = assemble(
            &[bestiary(), atlas()],
            &select(&[SelectionEntry::whole_page("Atlas", "Cave")]),
            &AssembleOptions::default(),
        )
        .unwrap();

        assert_eq!(texts(&doc)[0], "h0:Cave");
        assert_eq!(doc.title, "Atlas");
    }

    #[test]
    fn test_empty_selection() {
        let result = assemble(&[bestiary()], &Selection::new(), &AssembleOptions::default());
        assert!(matches!(result, Err(Error::EmptySelection)));
    }

    #[test]
    fn test_selection_matching_nothing() {
        let result = assemble(
            &[bestiary()],
            &select(&[SelectionEntry::heading("Bestiary", "Wolf", "h2:Nope")]),
            &AssembleOptions::default(),
        );
        assert!(matches!(result, Err(Error::EmptySelection)));
    }

    #[test]
    fn test_repeated_page_titles_selected_by_key() {
        let journal = Journal::new(
            "J",
            vec![
                page("Same", "<h2>Notes</h2><p>one</p>"),
                page("Same", "<h2>Notes</h2><p>two</p>"),
            ],
        );
        let journals = [journal];
        let paragraphs = |selection: Selection| -> Vec<String> {
            assemble(&journals, &selection, &AssembleOptions::default())
                .unwrap()
                .elements
                .into_iter()
                .filter_map(|e| match e {
                    Element::Paragraph { text } => Some(text),
                    _ => None,
                })
                .collect()
        };

        assert_eq!(paragraphs(select(&[SelectionEntry::whole_page("J", "Same")])), vec!["one"]);
        assert_eq!(paragraphs(select(&[SelectionEntry::whole_page("J", "Same#2")])), vec!["two"]);
        assert_eq!(
            paragraphs(select(&[SelectionEntry::heading("J", "Same#2", "h2:Notes")])),
            vec!["two"]
        );
    }

    #[test]
    fn test_duplicate_titles_get_distinct_anchors() {
        let journal = Journal::new(
            "J",
            vec![
                page("Same", "<h2>Notes</h2><h2>Notes</h2>"),
                page("Same", "<h2>Notes</h2>"),
            ],
        );
        let doc = assemble(
            &[journal.clone()],
            &Selection::all(&[journal]),
            &AssembleOptions::default(),
        )
        .unwrap();

        let anchors: HashSet<_> = doc.toc.iter().map(|t| t.anchor.clone()).collect();
        assert_eq!(doc.toc.len(), 5);
        assert_eq!(anchors.len(), 5);
    }

    #[test]
    fn test_anchors_are_stable() {
        let selection = Selection::all(&[bestiary()]);
        let a = assemble(&[bestiary()], &selection, &AssembleOptions::default()).unwrap();
        let b = assemble(&[bestiary()], &selection, &AssembleOptions::default()).unwrap();
        assert_eq!(a.toc, b.toc);

        let anchor = &a.toc[0].anchor;
        assert!(anchor.as_str().starts_with("sec-"));
        assert_eq!(anchor.as_str().len(), 16);
    }

    #[test]
    fn test_missing_image_placeholder() {
        let journal = Journal::new("J", vec![page("P", r#"<h2>H</h2><img src="gone.png">"#)]);
        let doc = assemble(
            &[journal.clone()],
            &Selection::all(&[journal]),
            &AssembleOptions::default(),
        )
        .unwrap();

        assert!(doc.elements.contains(&Element::MissingImage {
            src: "gone.png".into()
        }));
    }
}
