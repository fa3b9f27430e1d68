//! Wrap a raster image in a one-page PDF.

use crate::error::ForgeError;
use crate::output::write_output;
use printpdf::{
    Mm, Op, PdfDocument, PdfPage, PdfSaveOptions, RawImage, RawImageData, RawImageFormat,
    XObjectTransform,
};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Resolution used when none is given.
pub const DEFAULT_DPI: f32 = 100.0;

const MM_PER_INCH: f32 = 25.4;

/// The image path with its extension replaced by `.pdf`.
pub fn default_pdf_path(image: &Path) -> PathBuf {
    image.with_extension("pdf")
}

/// Page size in millimetres for an image of `width`×`height` pixels at `dpi`.
pub fn page_size_mm(width: u32, height: u32, dpi: f32) -> (f32, f32) {
    (
        width as f32 / dpi * MM_PER_INCH,
        height as f32 / dpi * MM_PER_INCH,
    )
}

/// Converts `image` into a single-page PDF at `pdf`.
///
/// The image is decoded and flattened to RGB; the page is exactly the size
/// of the image at `dpi`. Returns the PDF size in bytes.
pub async fn image_to_pdf(image: &Path, pdf: &Path, dpi: f32) -> Result<usize, ForgeError> {
    if !(dpi.is_finite() && dpi > 0.0) {
        return Err(ForgeError::InvalidConfig(format!("dpi must be positive, got {dpi}")));
    }
    let bytes = tokio::fs::read(image)
        .await
        .map_err(|e| ForgeError::from_input_io(image, e))?;

    let image_path = image.to_path_buf();
    let title = image
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    // Decoding a tall screenshot and deflating it is CPU-bound.
    let pdf_bytes = tokio::task::spawn_blocking(move || encode_pdf(&bytes, &image_path, &title, dpi))
        .await
        .map_err(|e| ForgeError::Internal(format!("PDF task panicked: {e}")))??;

    write_output(pdf, &pdf_bytes).await?;
    Ok(pdf_bytes.len())
}

fn encode_pdf(bytes: &[u8], path: &Path, title: &str, dpi: f32) -> Result<Vec<u8>, ForgeError> {
    let rgb = image::load_from_memory(bytes)
        .map_err(|e| ForgeError::ImageDecode {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?
        .to_rgb8();
    let (width, height) = rgb.dimensions();
    if width == 0 || height == 0 {
        return Err(ForgeError::ImageDecode {
            path: path.to_path_buf(),
            detail: "image has no pixels".into(),
        });
    }
    debug!(width, height, dpi, "embedding image in PDF");

    let raw = RawImage {
        pixels: RawImageData::U8(rgb.into_raw()),
        width: width as usize,
        height: height as usize,
        data_format: RawImageFormat::RGB8,
        tag: Vec::new(),
    };

    let mut doc = PdfDocument::new(title);
    let id = doc.add_image(&raw);
    let (w_mm, h_mm) = page_size_mm(width, height, dpi);
    let ops = vec![Op::UseXobject {
        id,
        transform: XObjectTransform {
            dpi: Some(dpi),
            ..Default::default()
        },
    }];
    let page = PdfPage::new(Mm(w_mm), Mm(h_mm), ops);

    let mut warnings = Vec::new();
    let out = doc
        .with_pages(vec![page])
        .save(&PdfSaveOptions::default(), &mut warnings);
    for w in &warnings {
        warn!("PDF: {w:?}");
    }
    if out.is_empty() {
        return Err(ForgeError::PdfEncode("printpdf produced no output".into()));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_size_follows_dpi() {
        let (w, h) = page_size_mm(1200, 100, 100.0);
        assert!((w - 304.8).abs() < 0.01);
        assert!((h - 25.4).abs() < 0.01);
    }

    #[test]
    fn default_pdf_path_swaps_extension() {
        assert_eq!(
            default_pdf_path(Path::new("out/page_fullpage.png")),
            PathBuf::from("out/page_fullpage.pdf")
        );
    }

    #[tokio::test]
    async fn converts_rgba_png_to_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let png = dir.path().join("shot.png");
        image::RgbaImage::from_pixel(40, 120, image::Rgba([10, 20, 30, 128]))
            .save(&png)
            .unwrap();
        let pdf = dir.path().join("shot.pdf");

        let size = image_to_pdf(&png, &pdf, DEFAULT_DPI).await.unwrap();
        let written = std::fs::read(&pdf).unwrap();
        assert_eq!(size, written.len());
        assert!(written.starts_with(b"%PDF"));
    }

    #[tokio::test]
    async fn garbage_input_is_a_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let bogus = dir.path().join("bogus.png");
        std::fs::write(&bogus, b"not an image").unwrap();
        let err = image_to_pdf(&bogus, &dir.path().join("x.pdf"), DEFAULT_DPI)
            .await
            .unwrap_err();
        assert!(matches!(err, ForgeError::ImageDecode { .. }));
    }

    #[tokio::test]
    async fn rejects_non_positive_dpi() {
        let err = image_to_pdf(Path::new("x.png"), Path::new("x.pdf"), 0.0)
            .await
            .unwrap_err();
        assert!(matches!(err, ForgeError::InvalidConfig(_)));
    }
}
