//! Benchmarks for the export → PDF pipeline.
//!
//! Run with: cargo bench

use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};

use journal_pdf::{
    AssembleOptions, ExtractContext, RenderConfig, Selection, assemble, extract_journals,
    extract_page, normalize_markup, render_pdf,
};

const BESTIARY_JSON: &str = include_str!("../tests/fixtures/bestiary.json");

/// A larger page built by repeating the fixture's markup.
fn long_page() -> String {
    let payload: serde_json::Value = serde_json::from_str(BESTIARY_JSON).unwrap();
    let pages = payload["pages"].as_array().unwrap();
    let html: String = pages
        .iter()
        .filter_map(|p| p["text"]["content"].as_str())
        .collect();
    html.repeat(50)
}

// ============================================================================
// Extraction Benchmarks
// ============================================================================

fn bench_normalize(c: &mut Criterion) {
    let html = long_page();
    c.bench_function("normalize_markup", |b| {
        b.iter(|| normalize_markup(black_box(&html)));
    });
}

fn bench_extract_page(c: &mut Criterion) {
    let html = long_page();
    c.bench_function("extract_page", |b| {
        b.iter(|| extract_page(black_box(&html)));
    });
}

fn bench_extract_journals(c: &mut Criterion) {
    let payload: serde_json::Value = serde_json::from_str(BESTIARY_JSON).unwrap();
    let ctx = ExtractContext::new();
    c.bench_function("extract_journals", |b| {
        b.iter(|| extract_journals(black_box(&payload), &ctx).unwrap());
    });
}

// ============================================================================
// Assembly and Rendering Benchmarks
// ============================================================================

fn bench_assemble(c: &mut Criterion) {
    let payload: serde_json::Value = serde_json::from_str(BESTIARY_JSON).unwrap();
    let journals = extract_journals(&payload, &ExtractContext::new()).unwrap();
    let selection = Selection::all(&journals);
    let options = AssembleOptions::default();

    c.bench_function("assemble", |b| {
        b.iter(|| assemble(black_box(&journals), &selection, &options).unwrap());
    });
}

fn bench_render(c: &mut Criterion) {
    let payload: serde_json::Value = serde_json::from_str(BESTIARY_JSON).unwrap();
    let journals = extract_journals(&payload, &ExtractContext::new()).unwrap();
    let doc = assemble(&journals, &Selection::all(&journals), &AssembleOptions::default()).unwrap();
    let config = RenderConfig::default();

    c.bench_function("render_pdf", |b| {
        b.iter(|| render_pdf(black_box(&doc), &config).unwrap());
    });
}

criterion_group!(
    benches,
    bench_normalize,
    bench_extract_page,
    bench_extract_journals,
    bench_assemble,
    bench_render,
);

criterion_main!(benches);
