//! Writing laid-out pages into a lopdf document.

use std::collections::HashMap;
use std::io::Write;

use flate2::Compression;
use flate2::write::ZlibEncoder;
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, StringFormat, dictionary};

use crate::assemble::{Anchor, TocEntry};
use crate::error::Result;

use super::RenderConfig;
use super::images::EmbeddedImage;
use super::layout::{Color, DrawOp, LinkTarget, PageLayout, Rect};
use super::metrics::to_win_ansi;
use super::text::strip_markers;

const FONT_REGULAR: &str = "F1";
const FONT_BOLD: &str = "F2";

/// Absolute position of an anchor in the final document.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Destination {
    /// Zero-based page index.
    pub page: usize,
    /// Distance from the top of the page.
    pub y: f32,
}

pub(super) struct PdfInput<'a> {
    pub title: &'a str,
    pub pages: &'a [PageLayout],
    pub destinations: &'a HashMap<Anchor, Destination>,
    pub toc: &'a [TocEntry],
    /// Index of the first table-of-contents page.
    pub toc_page: usize,
    pub images: &'a [EmbeddedImage],
}

pub(super) fn write_pdf(input: &PdfInput<'_>, config: &RenderConfig) -> Result<Vec<u8>> {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();

    let regular_id = doc.add_object(font_dict("Helvetica"));
    let bold_id = doc.add_object(font_dict("Helvetica-Bold"));

    let mut xobjects = Dictionary::new();
    for (i, image) in input.images.iter().enumerate() {
        let stream = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => i64::from(image.width),
                "Height" => i64::from(image.height),
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
                "Filter" => "FlateDecode",
            },
            image.data.clone(),
        );
        xobjects.set(image_name(i), doc.add_object(stream));
    }

    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            FONT_REGULAR => regular_id,
            FONT_BOLD => bold_id,
        },
        "XObject" => xobjects,
    });

    // Allocated up front so links can point at later pages.
    let page_ids: Vec<ObjectId> = input.pages.iter().map(|_| doc.new_object_id()).collect();

    for (page, &page_id) in input.pages.iter().zip(&page_ids) {
        let content = page_content(page, config.page_height);
        let content_id = doc.add_object(compressed_stream(&content.encode()?)?);

        let mut annots = Vec::new();
        for link in &page.links {
            let target = match &link.target {
                LinkTarget::Anchor(anchor) => input.destinations.get(anchor).copied(),
                LinkTarget::TableOfContents => Some(Destination {
                    page: input.toc_page,
                    y: 0.0,
                }),
            };
            let Some(dest) = target.and_then(|d| destination(&page_ids, d, config.page_height))
            else {
                continue;
            };
            let action_id = doc.add_object(dictionary! {
                "Type" => "Action",
                "S" => "GoTo",
                "D" => dest,
            });
            let annot_id = doc.add_object(dictionary! {
                "Type" => "Annot",
                "Subtype" => "Link",
                "Rect" => pdf_rect(&link.rect, config.page_height),
                "Border" => vec![Object::Integer(0), Object::Integer(0), Object::Integer(0)],
                "A" => action_id,
            });
            annots.push(Object::Reference(annot_id));
        }

        let mut page_dict = dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                config.page_width.into(),
                config.page_height.into(),
            ],
            "Contents" => content_id,
            "Resources" => resources_id,
        };
        if !annots.is_empty() {
            page_dict.set("Annots", annots);
        }
        doc.objects.insert(page_id, Object::Dictionary(page_dict));
    }

    let kids: Vec<Object> = page_ids.iter().map(|&id| id.into()).collect();
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_ids.len() as i64,
        }),
    );

    let mut catalog = dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    };
    if let Some(outlines_id) = build_outlines(&mut doc, input, &page_ids, config.page_height) {
        catalog.set("Outlines", outlines_id);
        catalog.set("PageMode", "UseOutlines");
    }
    let catalog_id = doc.add_object(catalog);
    doc.trailer.set("Root", catalog_id);

    let info_id = doc.add_object(dictionary! {
        "Title" => Object::String(to_win_ansi(&strip_markers(input.title)), StringFormat::Literal),
        "Producer" => Object::string_literal(concat!("journal-pdf ", env!("CARGO_PKG_VERSION"))),
    });
    doc.trailer.set("Info", info_id);

    let mut out = Vec::new();
    doc.save_to(&mut out)?;
    Ok(out)
}

fn font_dict(base: &str) -> Dictionary {
    dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => base,
        "Encoding" => "WinAnsiEncoding",
    }
}

fn image_name(index: usize) -> String {
    format!("Im{index}")
}

fn compressed_stream(bytes: &[u8]) -> Result<Stream> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes)?;
    Ok(Stream::new(
        dictionary! {"Filter" => "FlateDecode"},
        encoder.finish()?,
    ))
}

/// `[page FitH top]`, or `None` if the page does not exist.
fn destination(page_ids: &[ObjectId], dest: Destination, page_height: f32) -> Option<Vec<Object>> {
    let page_id = *page_ids.get(dest.page)?;
    Some(vec![
        Object::Reference(page_id),
        "FitH".into(),
        (page_height - dest.y).into(),
    ])
}

fn pdf_rect(rect: &Rect, page_height: f32) -> Vec<Object> {
    vec![
        rect.x.into(),
        (page_height - rect.y - rect.height).into(),
        (rect.x + rect.width).into(),
        (page_height - rect.y).into(),
    ]
}

fn color_operands(color: Color) -> Vec<Object> {
    color.iter().map(|&c| c.into()).collect()
}

fn page_content(page: &PageLayout, page_height: f32) -> Content {
    let mut ops = Vec::new();

    for op in &page.ops {
        match op {
            DrawOp::Text {
                x,
                baseline,
                size,
                bold,
                color,
                text,
            } => {
                if text.is_empty() {
                    continue;
                }
                let font = if *bold { FONT_BOLD } else { FONT_REGULAR };
                ops.push(Operation::new("BT", vec![]));
                ops.push(Operation::new("Tf", vec![Object::Name(font.as_bytes().to_vec()), (*size).into()]));
                ops.push(Operation::new("rg", color_operands(*color)));
                ops.push(Operation::new("Td", vec![(*x).into(), (page_height - baseline).into()]));
                ops.push(Operation::new(
                    "Tj",
                    vec![Object::String(to_win_ansi(text), StringFormat::Literal)],
                ));
                ops.push(Operation::new("ET", vec![]));
            }
            DrawOp::Line {
                from,
                to,
                width,
                color,
            } => {
                ops.push(Operation::new("q", vec![]));
                ops.push(Operation::new("RG", color_operands(*color)));
                ops.push(Operation::new("w", vec![(*width).into()]));
                ops.push(Operation::new("m", vec![from.0.into(), (page_height - from.1).into()]));
                ops.push(Operation::new("l", vec![to.0.into(), (page_height - to.1).into()]));
                ops.push(Operation::new("S", vec![]));
                ops.push(Operation::new("Q", vec![]));
            }
            DrawOp::Frame { rect, color } => {
                ops.push(Operation::new("q", vec![]));
                ops.push(Operation::new("RG", color_operands(*color)));
                ops.push(Operation::new("w", vec![0.5_f32.into()]));
                ops.push(Operation::new(
                    "re",
                    vec![
                        rect.x.into(),
                        (page_height - rect.y - rect.height).into(),
                        rect.width.into(),
                        rect.height.into(),
                    ],
                ));
                ops.push(Operation::new("S", vec![]));
                ops.push(Operation::new("Q", vec![]));
            }
            DrawOp::Image { image, rect } => {
                ops.push(Operation::new("q", vec![]));
                ops.push(Operation::new(
                    "cm",
                    vec![
                        rect.width.into(),
                        Object::Integer(0),
                        Object::Integer(0),
                        rect.height.into(),
                        rect.x.into(),
                        (page_height - rect.y - rect.height).into(),
                    ],
                ));
                ops.push(Operation::new(
                    "Do",
                    vec![Object::Name(image_name(image.index).into_bytes())],
                ));
                ops.push(Operation::new("Q", vec![]));
            }
        }
    }

    Content { operations: ops }
}

struct OutlineItem {
    id: ObjectId,
    title: String,
    dest: Vec<Object>,
    children: Vec<usize>,
}

/// Bookmarks mirroring the TOC levels. Returns the outline root.
fn build_outlines(
    doc: &mut Document,
    input: &PdfInput<'_>,
    page_ids: &[ObjectId],
    page_height: f32,
) -> Option<ObjectId> {
    let mut items: Vec<OutlineItem> = Vec::new();
    let mut roots: Vec<usize> = Vec::new();
    let mut level_stack: Vec<(u8, usize)> = Vec::new();

    for entry in input.toc {
        let Some(dest) = input
            .destinations
            .get(&entry.anchor)
            .and_then(|&d| destination(page_ids, d, page_height))
        else {
            continue;
        };

        while level_stack
            .last()
            .is_some_and(|&(level, _)| level >= entry.level)
        {
            level_stack.pop();
        }

        let index = items.len();
        items.push(OutlineItem {
            id: doc.new_object_id(),
            title: strip_markers(&entry.text),
            dest,
            children: Vec::new(),
        });
        match level_stack.last() {
            Some(&(_, parent)) => items[parent].children.push(index),
            None => roots.push(index),
        }
        level_stack.push((entry.level, index));
    }

    let (&first, &last) = (roots.first()?, roots.last()?);
    let root_id = doc.new_object_id();
    write_outline_level(doc, &items, &roots, root_id);
    doc.objects.insert(
        root_id,
        Object::Dictionary(dictionary! {
            "Type" => "Outlines",
            "First" => items[first].id,
            "Last" => items[last].id,
            "Count" => roots.len() as i64,
        }),
    );
    Some(root_id)
}

fn write_outline_level(doc: &mut Document, items: &[OutlineItem], level: &[usize], parent: ObjectId) {
    for (i, &index) in level.iter().enumerate() {
        let item = &items[index];
        let mut dict = dictionary! {
            "Title" => Object::String(to_win_ansi(&item.title), StringFormat::Literal),
            "Parent" => parent,
            "Dest" => item.dest.clone(),
        };
        if i > 0 {
            dict.set("Prev", items[level[i - 1]].id);
        }
        if let Some(&next) = level.get(i + 1) {
            dict.set("Next", items[next].id);
        }
        if let (Some(&first), Some(&last)) = (item.children.first(), item.children.last()) {
            dict.set("First", items[first].id);
            dict.set("Last", items[last].id);
            dict.set("Count", -(item.children.len() as i64));
            write_outline_level(doc, items, &item.children, item.id);
        }
        doc.objects.insert(item.id, Object::Dictionary(dict));
    }
}
