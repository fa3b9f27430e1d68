//! Loading reference images for editing and style transfer.

use super::provider::InlineImage;
use image::ImageFormat;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Formats the image API accepts as inline input.
const ACCEPTED: [ImageFormat; 4] = [
    ImageFormat::Png,
    ImageFormat::Jpeg,
    ImageFormat::WebP,
    ImageFormat::Gif,
];

/// A reference image that passed loading, with the path it came from.
#[derive(Debug, Clone)]
pub struct LoadedReference {
    pub path: PathBuf,
    pub image: InlineImage,
}

/// Reads every reference image in order.
///
/// A path that is missing, unreadable, or not a recognised image is skipped
/// with a warning; the generation still runs with the remaining references.
pub async fn load_reference_images(paths: &[PathBuf]) -> Vec<LoadedReference> {
    let mut out = Vec::with_capacity(paths.len());
    for (i, path) in paths.iter().enumerate() {
        match load_one(path).await {
            Ok(img) => {
                info!(
                    "Using reference image {}: {} ({}, {} bytes)",
                    i + 1,
                    path.display(),
                    img.mime_type,
                    img.data.len()
                );
                out.push(LoadedReference {
                    path: path.clone(),
                    image: img,
                });
            }
            Err(reason) => warn!("Could not load reference image {}: {reason}", path.display()),
        }
    }
    out
}

async fn load_one(path: &Path) -> Result<InlineImage, String> {
    let data = tokio::fs::read(path).await.map_err(|e| e.to_string())?;
    let mime = sniff_mime(&data)?;
    Ok(InlineImage::new(mime, data))
}

/// MIME type of `data` judged by its magic bytes.
pub fn sniff_mime(data: &[u8]) -> Result<&'static str, String> {
    let format = image::guess_format(data).map_err(|_| "not a recognised image".to_string())?;
    if !ACCEPTED.contains(&format) {
        return Err(format!("unsupported image format {format:?}"));
    }
    Ok(format.to_mime_type())
}
