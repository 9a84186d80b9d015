//! Image reference → file resolution.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, warn};
use percent_encoding::percent_decode_str;

use crate::error::Error;

use super::model::{ImageAsset, ImageBlock};

/// Resolve an image reference against a journal's asset root.
///
/// Tried in order, first existing file wins:
/// 1. the reference as an absolute path
/// 2. `root/reference`
/// 3. `root/reference` without a leading `assets/` folder
/// 4. `root/basename`
///
/// Percent-encoded references are also tried decoded.
pub fn resolve_asset(asset_root: Option<&Path>, reference: &str) -> Option<PathBuf> {
    let reference = reference.trim();
    if reference.is_empty() {
        return None;
    }

    let decoded = percent_decode_str(reference)
        .decode_utf8()
        .ok()
        .map(|s| s.into_owned())
        .filter(|s| s != reference);

    std::iter::once(reference)
        .chain(decoded.as_deref())
        .find_map(|r| resolve_one(asset_root, r))
}

fn resolve_one(asset_root: Option<&Path>, reference: &str) -> Option<PathBuf> {
    let direct = Path::new(reference);
    if direct.is_absolute() && direct.is_file() {
        return Some(direct.to_path_buf());
    }

    let root = asset_root?;
    let relative = reference
        .split(['?', '#'])
        .next()
        .unwrap_or(reference)
        .trim_start_matches("./")
        .trim_start_matches('/');

    let mut candidates = vec![root.join(relative)];
    if let Some(stripped) = strip_assets_prefix(relative) {
        candidates.push(root.join(stripped));
    }
    if let Some(name) = Path::new(relative).file_name() {
        candidates.push(root.join(name));
    }

    candidates.into_iter().find(|p| p.is_file())
}

fn strip_assets_prefix(reference: &str) -> Option<&str> {
    let (head, rest) = reference.split_once('/')?;
    head.eq_ignore_ascii_case("assets").then_some(rest)
}

/// Resolve and read an image's bytes. Failures leave the asset unset.
pub(crate) fn load_image_asset(image: &mut ImageBlock, asset_root: Option<&Path>) {
    let Some(path) = resolve_asset(asset_root, &image.src) else {
        warn!("{}", Error::AssetUnresolved(image.src.clone()));
        return;
    };

    match fs::read(&path) {
        Ok(bytes) => {
            debug!("Loaded image {} ({} bytes)", path.display(), bytes.len());
            image.asset = Some(ImageAsset {
                path,
                bytes: Arc::new(bytes),
            });
        }
        Err(e) => warn!("Could not read image {}: {e}", path.display()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(root: &Path, rel: &str) -> PathBuf {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, b"img").unwrap();
        path
    }

    #[test]
    fn test_direct_join() {
        let dir = tempfile::tempdir().unwrap();
        let expected = touch(dir.path(), "maps/cave.png");
        assert_eq!(resolve_asset(Some(dir.path()), "maps/cave.png"), Some(expected));
    }

    #[test]
    fn test_redundant_assets_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let expected = touch(dir.path(), "cave.png");
        assert_eq!(resolve_asset(Some(dir.path()), "assets/cave.png"), Some(expected));
    }

    #[test]
    fn test_basename_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let expected = touch(dir.path(), "cave.png");
        assert_eq!(
            resolve_asset(Some(dir.path()), "worlds/x/scenes/cave.png"),
            Some(expected)
        );
    }

    #[test]
    fn test_absolute_path() {
        let dir = tempfile::tempdir().unwrap();
        let expected = touch(dir.path(), "abs.png");
        let reference = expected.to_string_lossy().into_owned();
        assert_eq!(resolve_asset(None, &reference), Some(expected));
    }

    #[test]
    fn test_percent_encoded() {
        let dir = tempfile::tempdir().unwrap();
        let expected = touch(dir.path(), "dark cave.png");
        assert_eq!(
            resolve_asset(Some(dir.path()), "assets/dark%20cave.png"),
            Some(expected)
        );
    }

    #[test]
    fn test_unresolved() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(resolve_asset(Some(dir.path()), "missing.png"), None);
        assert_eq!(resolve_asset(None, "missing.png"), None);
        assert_eq!(resolve_asset(Some(dir.path()), ""), None);
    }

    #[test]
    fn test_load_reads_bytes() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "a.png");
        let mut image = ImageBlock::new("a.png");
        load_image_asset(&mut image, Some(dir.path()));
        let asset = image.asset.expect("resolved");
        assert_eq!(asset.bytes.as_slice(), b"img");
    }
}
