//! Loading export files from disk.
//!
//! An export is either a journal JSON file or a ZIP archive holding
//! `journal.json` (or a `manifest.json` folder export) plus an `assets/`
//! directory. Archives are unpacked into a temporary directory that lives as
//! long as the journals loaded from it.

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, info, warn};
use serde_json::Value;
use tempfile::TempDir;
use zip::ZipArchive;

use crate::error::{Error, Result};
use crate::extract::{DEFAULT_JOURNAL_TITLE, ExtractContext, Journal, extract_journals};

const JOURNAL_FILE: &str = "journal.json";
const MANIFEST_FILE: &str = "manifest.json";
const ASSET_DIRS: &[&str] = &["assets", "Assets"];

/// Load every journal in one export file.
pub fn load_export(path: impl AsRef<Path>) -> Result<Vec<Journal>> {
    let path = path.as_ref();
    let is_zip = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("zip"));

    let mut journals = if is_zip {
        load_zip(path)?
    } else {
        load_json(path)?
    };
    dedupe_journal_titles(&mut journals);

    info!("Loaded {} journal(s) from {}", journals.len(), path.display());
    Ok(journals)
}

/// A file that failed to load in a batch.
#[derive(Debug)]
pub struct LoadFailure {
    pub path: PathBuf,
    pub error: Error,
}

/// Result of loading several exports at once.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub journals: Vec<Journal>,
    pub failures: Vec<LoadFailure>,
}

impl LoadReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Load several exports. A failing file is recorded and the rest still load.
pub fn load_exports<P: AsRef<Path>>(paths: &[P]) -> LoadReport {
    let mut report = LoadReport::default();
    for path in paths {
        let path = path.as_ref();
        match load_export(path) {
            Ok(mut journals) => report.journals.append(&mut journals),
            Err(error) => {
                warn!("Failed to load {}: {error}", path.display());
                report.failures.push(LoadFailure {
                    path: path.to_path_buf(),
                    error,
                });
            }
        }
    }
    dedupe_journal_titles(&mut report.journals);
    report
}

/// Give repeated journal titles a ` (n)` suffix so selections name one journal.
///
/// Call this after combining journals from separate loads.
pub fn dedupe_journal_titles(journals: &mut [Journal]) {
    let mut seen: HashSet<String> = HashSet::new();
    for journal in journals.iter_mut() {
        let base = match journal.title.trim() {
            "" => DEFAULT_JOURNAL_TITLE.to_string(),
            trimmed => trimmed.to_string(),
        };
        let mut title = base.clone();
        let mut n = 2;
        while seen.contains(&title) {
            title = format!("{base} ({n})");
            n += 1;
        }
        if title != journal.title {
            debug!("Renamed journal {:?} to {:?}", journal.title, title);
        }
        seen.insert(title.clone());
        journal.title = title;
    }
}

fn load_json(path: &Path) -> Result<Vec<Journal>> {
    let payload = read_json(path)?;
    let dir = path.parent().unwrap_or(Path::new(".")).to_path_buf();

    let asset_root = find_asset_dir(&dir).unwrap_or_else(|| dir.clone());
    let mut ctx = ExtractContext::new()
        .with_asset_root(asset_root)
        .with_base_dir(dir);
    if is_named(path, MANIFEST_FILE) {
        ctx = ctx.as_manifest();
    }

    extract_journals(&payload, &ctx)
}

fn load_zip(path: &Path) -> Result<Vec<Journal>> {
    let workdir = Arc::new(tempfile::Builder::new().prefix("journal-export-").tempdir()?);
    let root = workdir.path().to_path_buf();

    let mut archive = ZipArchive::new(BufReader::new(File::open(path)?))?;
    archive.extract(&root)?;
    debug!("Extracted {} entries to {}", archive.len(), root.display());

    let (json_path, manifest) = match find_file(&root, JOURNAL_FILE) {
        Some(found) => (found, false),
        None => match find_file(&root, MANIFEST_FILE) {
            Some(found) => (found, true),
            None => {
                return Err(Error::Parse(format!(
                    "{} contains neither {JOURNAL_FILE} nor {MANIFEST_FILE}",
                    path.display()
                )));
            }
        },
    };

    let payload = read_json(&json_path)?;
    let json_dir = json_path.parent().unwrap_or(&root).to_path_buf();
    let asset_root = find_asset_dir(&root)
        .or_else(|| find_asset_dir(&json_dir))
        .unwrap_or_else(|| json_dir.clone());
    // Folder exports list journal files relative to the archive root.
    let base_dir = if manifest { root.clone() } else { json_dir };

    let mut ctx = ExtractContext::new()
        .with_asset_root(asset_root)
        .with_base_dir(base_dir)
        .with_workdir(workdir);
    if manifest {
        ctx = ctx.as_manifest();
    }

    extract_journals(&payload, &ctx)
}

fn read_json(path: &Path) -> Result<Value> {
    let bytes = fs::read(path)?;
    let bytes = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(&bytes);
    Ok(serde_json::from_slice(bytes)?)
}

fn is_named(path: &Path, name: &str) -> bool {
    path.file_name()
        .is_some_and(|n| n.to_string_lossy().eq_ignore_ascii_case(name))
}

fn find_asset_dir(dir: &Path) -> Option<PathBuf> {
    ASSET_DIRS
        .iter()
        .map(|name| dir.join(name))
        .find(|p| p.is_dir())
}

/// Find `name` directly under `root`, else breadth-first in sorted order.
fn find_file(root: &Path, name: &str) -> Option<PathBuf> {
    let mut queue = vec![root.to_path_buf()];
    while !queue.is_empty() {
        let mut next = Vec::new();
        for dir in queue {
            let Ok(entries) = fs::read_dir(&dir) else {
                continue;
            };
            let mut paths: Vec<PathBuf> = entries.filter_map(|e| e.ok().map(|e| e.path())).collect();
            paths.sort();
            for path in paths {
                if path.is_dir() {
                    next.push(path);
                } else if is_named(&path, name) {
                    return Some(path);
                }
            }
        }
        queue = next;
    }
    None
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use zip::write::SimpleFileOptions;

    use super::*;

    fn write_zip(path: &Path, files: &[(&str, &[u8])]) {
        let mut zip = zip::ZipWriter::new(File::create(path).unwrap());
        for (name, data) in files {
            zip.start_file(*name, SimpleFileOptions::default()).unwrap();
            zip.write_all(data).unwrap();
        }
        zip.finish().unwrap();
    }

    const JOURNAL: &str = r#"{"name": "Atlas", "pages": [
        {"name": "Cave", "sort": 1, "text": {"content": "<h2>Map</h2><img src=\"assets/cave.png\">"}}
    ]}"#;

    #[test]
    fn test_load_plain_json_with_sibling_assets() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("assets")).unwrap();
        fs::write(dir.path().join("assets/cave.png"), b"png").unwrap();
        let json = dir.path().join("atlas.json");
        fs::write(&json, JOURNAL).unwrap();

        let journals = load_export(&json).unwrap();

        assert_eq!(journals.len(), 1);
        assert_eq!(journals[0].asset_root.as_deref(), Some(dir.path().join("assets").as_path()));
        let crate::extract::ContentBlock::Image(image) = &journals[0].pages[0].headings[0].blocks[0]
        else {
            panic!("expected image");
        };
        assert!(image.asset.is_some());
    }

    #[test]
    fn test_load_zip_keeps_assets_alive() {
        let dir = tempfile::tempdir().unwrap();
        let zip_path = dir.path().join("atlas.zip");
        write_zip(
            &zip_path,
            &[("journal.json", JOURNAL.as_bytes()), ("assets/cave.png", b"png")],
        );

        let journals = load_export(&zip_path).unwrap();

        let root = journals[0].asset_root.clone().unwrap();
        assert!(root.join("cave.png").is_file());
        assert!(journals[0].workdir.is_some());
    }

    #[test]
    fn test_load_zip_nested_journal() {
        let dir = tempfile::tempdir().unwrap();
        let zip_path = dir.path().join("nested.zip");
        write_zip(&zip_path, &[("export/data/journal.json", JOURNAL.as_bytes())]);

        let journals = load_export(&zip_path).unwrap();
        assert_eq!(journals[0].title, "Atlas");
    }

    #[test]
    fn test_load_zip_folder_export() {
        let dir = tempfile::tempdir().unwrap();
        let zip_path = dir.path().join("folder.zip");
        write_zip(
            &zip_path,
            &[
                ("manifest.json", br#"{"journals": ["journals/b.json", "journals/a.json"]}"#),
                ("journals/a.json", br#"{"name": "A", "pages": []}"#),
                ("journals/b.json", br#"{"name": "B", "pages": []}"#),
            ],
        );

        let journals = load_export(&zip_path).unwrap();
        let titles: Vec<_> = journals.iter().map(|j| j.title.as_str()).collect();
        assert_eq!(titles, vec!["B", "A"]);
    }

    #[test]
    fn test_zip_without_journal() {
        let dir = tempfile::tempdir().unwrap();
        let zip_path = dir.path().join("empty.zip");
        write_zip(&zip_path, &[("readme.txt", b"hi")]);

        assert!(matches!(load_export(&zip_path), Err(Error::Parse(_))));
    }

    #[test]
    fn test_batch_collects_failures() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.json");
        let bad = dir.path().join("bad.json");
        fs::write(&good, JOURNAL).unwrap();
        fs::write(&bad, "{").unwrap();
        let missing = dir.path().join("missing.json");

        let report = load_exports(&[&good, &bad, &missing]);

        assert_eq!(report.journals.len(), 1);
        assert_eq!(report.failures.len(), 2);
        assert!(matches!(report.failures[0].error, Error::Json(_)));
        assert!(matches!(report.failures[1].error, Error::Io(_)));
        assert!(!report.is_clean());
    }

    #[test]
    fn test_repeated_journal_titles_are_suffixed() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("first.json");
        let second = dir.path().join("second.json");
        fs::write(&first, JOURNAL).unwrap();
        fs::write(&second, r#"[{"name": "Atlas"}, {"name": "Atlas (2)"}]"#).unwrap();

        let report = load_exports(&[&first, &second]);

        let titles: Vec<_> = report.journals.iter().map(|j| j.title.as_str()).collect();
        assert_eq!(titles, vec!["Atlas", "Atlas (2)", "Atlas (2) (2)"]);
    }

    #[test]
    fn test_dedupe_journal_titles() {
        let mut journals = vec![
            Journal::new("Bestiary", Vec::new()),
            Journal::new(" Bestiary ", Vec::new()),
            Journal::new("Bestiary (2)", Vec::new()),
            Journal::new("", Vec::new()),
        ];

        dedupe_journal_titles(&mut journals);

        let titles: Vec<_> = journals.iter().map(|j| j.title.as_str()).collect();
        assert_eq!(titles, vec!["Bestiary", "Bestiary (2)", "Bestiary (3)", "Journal"]);
    }

    #[test]
    fn test_bom_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let json = dir.path().join("bom.json");
        let mut bytes = vec![0xEF, 0xBB, 0xBF];
        bytes.extend_from_slice(JOURNAL.as_bytes());
        fs::write(&json, bytes).unwrap();

        assert_eq!(load_export(&json).unwrap()[0].title, "Atlas");
    }
}
