//! End-to-end tests: export → selection → assembled document → PDF.
//!
//! Generated PDFs are loaded back with lopdf to check page structure,
//! link annotations and bookmarks.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{Cursor, Write};
use std::path::Path;

use image::{ImageOutputFormat, Rgba, RgbaImage};
use lopdf::{Document as LopdfDocument, Object, ObjectId};
use zip::write::SimpleFileOptions;

use journal_pdf::{
    AssembleOptions, BuildRequest, Builder, BuildOutcome, Element, Error, Journal, RenderConfig,
    Selection, SelectionEntry, assemble, build_pdf, load_export, load_exports, render,
};

const FIXTURES_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures");

fn fixture_path(name: &str) -> String {
    format!("{}/{}", FIXTURES_DIR, name)
}

fn bestiary() -> Vec<Journal> {
    load_export(fixture_path("bestiary.json")).expect("Failed to load fixture")
}

fn png(width: u32, height: u32) -> Vec<u8> {
    let image = RgbaImage::from_pixel(width, height, Rgba([40, 90, 160, 255]));
    let mut out = Cursor::new(Vec::new());
    image.write_to(&mut out, ImageOutputFormat::Png).unwrap();
    out.into_inner()
}

fn write_zip(path: &Path, files: &[(&str, &[u8])]) {
    let mut zip = zip::ZipWriter::new(File::create(path).unwrap());
    for (name, data) in files {
        zip.start_file(*name, SimpleFileOptions::default()).unwrap();
        zip.write_all(data).unwrap();
    }
    zip.finish().unwrap();
}

/// Page number (1-based) each link on `page` jumps to, in annotation order.
fn link_targets(doc: &LopdfDocument, page_id: ObjectId) -> Vec<u32> {
    let numbers: HashMap<ObjectId, u32> = doc.get_pages().into_iter().map(|(n, id)| (id, n)).collect();

    let Ok(annots) = doc
        .get_dictionary(page_id)
        .and_then(|page| page.get(b"Annots"))
        .and_then(Object::as_array)
    else {
        return Vec::new();
    };

    annots
        .iter()
        .map(|annot| {
            let annot = doc.get_dictionary(annot.as_reference().unwrap()).unwrap();
            assert_eq!(annot.get(b"Subtype").unwrap().as_name().unwrap(), b"Link");
            let action = doc
                .get_dictionary(annot.get(b"A").unwrap().as_reference().unwrap())
                .unwrap();
            let dest = action.get(b"D").unwrap().as_array().unwrap();
            numbers[&dest[0].as_reference().unwrap()]
        })
        .collect()
}

// ============================================================================
// Assembly
// ============================================================================

#[test]
fn test_heading_selection_excludes_preface() {
    let journals = bestiary();
    let selection: Selection = [SelectionEntry::heading("Bestiary", "Wolf", "h2:Stats")]
        .into_iter()
        .collect();

    let doc = assemble(&journals, &selection, &AssembleOptions::default()).unwrap();

    let headings: Vec<(u8, &str)> = doc
        .elements
        .iter()
        .filter_map(|e| match e {
            Element::Heading { level, text, .. } => Some((*level, text.as_str())),
            _ => None,
        })
        .collect();
    assert_eq!(headings, vec![(0, "Wolf"), (2, "Stats")]);
    assert!(!doc.elements.iter().any(|e| matches!(
        e,
        Element::Paragraph { text } if text.contains("lean canine")
    )));
    assert_eq!(doc.title, "Bestiary");
}

#[test]
fn test_repeated_headings_get_distinct_anchors() {
    let journals = bestiary();
    let doc = assemble(&journals, &Selection::all(&journals), &AssembleOptions::default()).unwrap();

    let stats: Vec<_> = doc
        .toc
        .iter()
        .filter(|t| t.text == "Stats")
        .map(|t| t.anchor.clone())
        .collect();
    assert_eq!(stats.len(), 3, "two on Wolf, one on Bear");
    assert_ne!(stats[0], stats[1]);
    assert_ne!(stats[1], stats[2]);

    let again = assemble(&journals, &Selection::all(&journals), &AssembleOptions::default()).unwrap();
    assert_eq!(doc.toc, again.toc, "anchors are stable across runs");
}

#[test]
fn test_same_named_exports_select_independently() {
    let dir = tempfile::tempdir().unwrap();
    let first = dir.path().join("first.json");
    let second = dir.path().join("second.json");
    for (path, text) in [(&first, "FIRST"), (&second, "SECOND")] {
        let journal = format!(
            r#"{{"name": "Bestiary", "pages": [{{"name": "Wolf", "text": "<p>{text}</p>"}}]}}"#
        );
        fs::write(path, journal).unwrap();
    }

    let journals = load_exports(&[&first, &second]).journals;
    let titles: Vec<&str> = journals.iter().map(|j| j.title.as_str()).collect();
    assert_eq!(titles, vec!["Bestiary", "Bestiary (2)"]);

    let selection: Selection = [SelectionEntry::whole_page("Bestiary", "Wolf")]
        .into_iter()
        .collect();
    let doc = assemble(&journals, &selection, &AssembleOptions::default()).unwrap();

    let paragraphs: Vec<&str> = doc
        .elements
        .iter()
        .filter_map(|e| match e {
            Element::Paragraph { text } => Some(text.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(paragraphs, vec!["FIRST"]);
    assert!(!doc.elements.iter().any(|e| matches!(e, Element::Title { .. })));
    assert_eq!(doc.title, "Bestiary");
}

// ============================================================================
// Rendering
// ============================================================================

#[test]
fn test_rendered_pdf_structure() {
    let journals = bestiary();
    let doc = assemble(&journals, &Selection::all(&journals), &AssembleOptions::default()).unwrap();
    let rendered = render(&doc, &RenderConfig::default()).unwrap();

    let pdf = LopdfDocument::load_mem(&rendered.bytes).unwrap();
    let pages = pdf.get_pages();
    assert!(pages.len() >= 3);
    assert_eq!(pages.len(), rendered.report.page_count);

    let toc_pages = rendered.report.toc_pages as u32;
    let first_content = 2 + toc_pages;

    // Cover has no links.
    assert!(link_targets(&pdf, pages[&1]).is_empty());

    // TOC links, in entry order, land on the pages holding their anchors.
    let toc_targets: Vec<u32> = (2..first_content)
        .flat_map(|n| link_targets(&pdf, pages[&n]))
        .collect();
    let expected: Vec<u32> = doc
        .toc
        .iter()
        .map(|entry| rendered.report.anchor_pages[&entry.anchor] as u32)
        .collect();
    assert_eq!(toc_targets, expected);
    assert!(toc_targets.iter().all(|&p| p >= first_content));

    // Every content page links back to the first TOC page, top and bottom.
    for n in first_content..=pages.len() as u32 {
        assert_eq!(link_targets(&pdf, pages[&n]), vec![2, 2], "page {n}");
    }
}

#[test]
fn test_outline_mirrors_toc() {
    let journals = bestiary();
    let doc = assemble(&journals, &Selection::all(&journals), &AssembleOptions::default()).unwrap();
    let rendered = render(&doc, &RenderConfig::default()).unwrap();
    let pdf = LopdfDocument::load_mem(&rendered.bytes).unwrap();

    let outlines = pdf
        .catalog()
        .unwrap()
        .get(b"Outlines")
        .and_then(Object::as_reference)
        .unwrap();
    let root = pdf.get_dictionary(outlines).unwrap();
    let top_level = doc.toc.iter().filter(|t| t.level == 0).count();
    assert_eq!(root.get(b"Count").unwrap().as_i64().unwrap(), top_level as i64);

    let first = pdf
        .get_dictionary(root.get(b"First").unwrap().as_reference().unwrap())
        .unwrap();
    assert_eq!(first.get(b"Title").unwrap().as_str().unwrap(), b"Wolf");
    // Wolf: Stats, Lore, Stats (Tactics nests under the first Stats).
    assert_eq!(first.get(b"Count").unwrap().as_i64().unwrap(), -3);
}

// ============================================================================
// Builds
// ============================================================================

#[test]
fn test_build_from_zip_with_images() {
    let dir = tempfile::tempdir().unwrap();
    let zip_path = dir.path().join("bestiary.zip");
    let journal = fs::read(fixture_path("bestiary.json")).unwrap();
    let image = png(240, 120);
    write_zip(
        &zip_path,
        &[("journal.json", journal.as_slice()), ("assets/wolf.png", image.as_slice())],
    );

    let journals = load_export(&zip_path).unwrap();
    let selection: Selection = [SelectionEntry::heading("Bestiary", "Wolf", "h2:Lore")]
        .into_iter()
        .collect();
    let out = dir.path().join("lore.pdf");
    build_pdf(&BuildRequest::new(journals, selection, &out)).unwrap();

    let pdf = LopdfDocument::load(&out).unwrap();
    let images = pdf
        .objects
        .values()
        .filter_map(|o| o.as_stream().ok())
        .filter(|s| {
            s.dict.get(b"Subtype").and_then(Object::as_name).ok() == Some(b"Image".as_slice())
        })
        .count();
    assert_eq!(images, 1);
}

#[test]
fn test_multi_journal_build_with_dividers() {
    let dir = tempfile::tempdir().unwrap();
    let atlas = dir.path().join("atlas.json");
    fs::write(
        &atlas,
        r#"{"name": "Atlas", "pages": [{"name": "Cave", "text": {"content": "<h2>Map</h2><p>dark</p>"}}]}"#,
    )
    .unwrap();

    let mut journals = load_export(&atlas).unwrap();
    journals.extend(bestiary());
    let selection = Selection::all(&journals);

    let with = assemble(&journals, &selection, &AssembleOptions::default()).unwrap();
    let without = assemble(
        &journals,
        &selection,
        &AssembleOptions::default().with_divider_pages(false),
    )
    .unwrap();
    assert_eq!(with.title, "Journals");
    assert_eq!(
        with.elements.iter().filter(|e| matches!(e, Element::Title { .. })).count(),
        2
    );
    assert!(!without.elements.iter().any(|e| matches!(e, Element::Title { .. })));

    let with_pages = render(&with, &RenderConfig::default()).unwrap().report.page_count;
    let without_pages = render(&without, &RenderConfig::default()).unwrap().report.page_count;
    assert_eq!(with_pages, without_pages + 2);
}

#[test]
fn test_empty_selection_writes_no_file() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("nothing.pdf");

    let result = build_pdf(&BuildRequest::new(bestiary(), Selection::new(), &out));

    assert!(matches!(result, Err(Error::EmptySelection)));
    assert!(!out.exists());
}

#[test]
fn test_background_builder_round() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("bg.pdf");
    let journals = bestiary();
    let selection = Selection::all(&journals);

    let builder = Builder::new();
    let handle = builder
        .submit(BuildRequest::new(journals, selection, &out))
        .unwrap();

    assert_eq!(handle.wait(), BuildOutcome::Completed(out.clone()));
    assert!(fs::read(&out).unwrap().starts_with(b"%PDF"));
}
