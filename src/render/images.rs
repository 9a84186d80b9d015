//! Decoding images into PDF-ready RGB pixel data.

use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;

use flate2::Compression;
use flate2::write::ZlibEncoder;
use log::{debug, warn};

use crate::error::Result;
use crate::extract::ImageBlock;

/// Pixel data for one image XObject, already zlib-compressed.
#[derive(Debug, Clone)]
pub struct EmbeddedImage {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

/// Reference from a layout op to an image in the store.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageRef {
    pub index: usize,
    pub width: u32,
    pub height: u32,
}

/// Decoded images, deduplicated by source path.
#[derive(Debug, Default)]
pub struct ImageStore {
    images: Vec<EmbeddedImage>,
    by_path: HashMap<PathBuf, Option<usize>>,
}

impl ImageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode the block's asset, or return the earlier result for the same
    /// file. `None` means the image cannot be drawn.
    pub fn load(&mut self, block: &ImageBlock) -> Option<ImageRef> {
        let asset = block.asset.as_ref()?;

        let index = match self.by_path.get(&asset.path) {
            Some(cached) => *cached,
            None => {
                let decoded = match encode_rgb(&asset.bytes) {
                    Ok(image) => {
                        debug!(
                            "Decoded {} ({}x{})",
                            asset.path.display(),
                            image.width,
                            image.height
                        );
                        self.images.push(image);
                        Some(self.images.len() - 1)
                    }
                    Err(e) => {
                        warn!("Cannot decode image {}: {e}", block.src);
                        None
                    }
                };
                self.by_path.insert(asset.path.clone(), decoded);
                decoded
            }
        }?;

        let image = &self.images[index];
        Some(ImageRef {
            index,
            width: image.width,
            height: image.height,
        })
    }

    pub fn images(&self) -> &[EmbeddedImage] {
        &self.images
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

/// Decode any supported format and flatten transparency onto white.
fn encode_rgb(bytes: &[u8]) -> Result<EmbeddedImage> {
    let rgba = image::load_from_memory(bytes)?.to_rgba8();
    let (width, height) = rgba.dimensions();

    let mut rgb = Vec::with_capacity(rgb_len(width, height));
    for pixel in rgba.pixels() {
        let [r, g, b, a] = pixel.0;
        let alpha = u16::from(a);
        for channel in [r, g, b] {
            let blended = (u16::from(channel) * alpha + 255 * (255 - alpha)) / 255;
            rgb.push(blended as u8);
        }
    }

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&rgb)?;
    Ok(EmbeddedImage {
        width,
        height,
        data: encoder.finish()?,
    })
}

/// Byte length of an RGB buffer, computed in `usize` so large images do not wrap.
fn rgb_len(width: u32, height: u32) -> usize {
    width as usize * height as usize * 3
}

#[cfg(test)]
pub(crate) mod tests {
    use std::io::{Cursor, Read};
    use std::sync::Arc;

    use flate2::read::ZlibDecoder;
    use image::{ImageOutputFormat, Rgba, RgbaImage};

    use super::*;
    use crate::extract::ImageAsset;

    pub(crate) fn png_bytes(width: u32, height: u32, color: [u8; 4]) -> Vec<u8> {
        let image = RgbaImage::from_pixel(width, height, Rgba(color));
        let mut out = Cursor::new(Vec::new());
        image.write_to(&mut out, ImageOutputFormat::Png).unwrap();
        out.into_inner()
    }

    fn block(path: &str, bytes: Vec<u8>) -> ImageBlock {
        let mut block = ImageBlock::new(path);
        block.asset = Some(ImageAsset {
            path: PathBuf::from(path),
            bytes: Arc::new(bytes),
        });
        block
    }

    #[test]
    fn test_decode_and_flatten_alpha() {
        let mut store = ImageStore::new();
        let image = store
            .load(&block("a.png", png_bytes(2, 3, [0, 0, 0, 0])))
            .unwrap();
        assert_eq!((image.width, image.height), (2, 3));

        let mut rgb = Vec::new();
        ZlibDecoder::new(store.images()[0].data.as_slice())
            .read_to_end(&mut rgb)
            .unwrap();
        assert_eq!(rgb.len(), 2 * 3 * 3);
        assert!(rgb.iter().all(|&b| b == 255), "transparent becomes white");
    }

    #[test]
    fn test_same_path_decoded_once() {
        let mut store = ImageStore::new();
        let first = store.load(&block("a.png", png_bytes(1, 1, [255, 0, 0, 255])));
        let second = store.load(&block("a.png", png_bytes(1, 1, [255, 0, 0, 255])));
        assert_eq!(first, second);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_undecodable_image() {
        let mut store = ImageStore::new();
        assert!(store.load(&block("bad.png", b"not an image".to_vec())).is_none());
        assert!(store.load(&ImageBlock::new("missing.png")).is_none());
        assert!(store.is_empty());
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn test_rgb_len_does_not_wrap() {
        assert_eq!(rgb_len(2, 3), 18);
        assert_eq!(rgb_len(40_000, 40_000), 4_800_000_000);
    }
}
