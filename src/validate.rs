//! Per-image validation and defensive normalization against the platform's
//! publish constraints, plus chapter-level aggregate checks.
//!
//! Any single bad page rejects its whole chapter; a partially valid chapter
//! is never uploaded.

use crate::discover::ChapterDescriptor;
use futures::stream::{FuturesUnordered, StreamExt};
use image::AnimationDecoder;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

/// Per-frame pixel ceiling; animated images are measured frame by frame
pub const MAX_FRAME_EDGE: u32 = 10_000;
/// Per-image byte ceiling after normalization (20 MiB)
pub const MAX_IMAGE_BYTES: usize = 20 * 1024 * 1024;
/// Per-chapter aggregate byte ceiling (200 MiB)
pub const MAX_CHAPTER_BYTES: u64 = 200 * 1024 * 1024;
/// Page count ceiling, from the platform's API documentation
pub const MAX_PAGES_PER_CHAPTER: usize = 500;

const JPEG_QUALITY: u8 = 80;
/// Bound on simultaneously decoded pages; caps raster buffer memory
const MAX_DECODE_WORKERS: usize = 4;

/// Formats the platform publishes as-is
const PUBLISH_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif"];
/// Formats we re-encode into the publish set
const CONVERTIBLE_EXTENSIONS: &[&str] = &["webp", "bmp", "tiff", "heic", "heif", "jxl"];

/// A page that passed validation, holding its final (possibly re-encoded)
/// bytes. Immutable once produced.
#[derive(Debug, Clone)]
pub struct ValidatedPage {
    pub bytes: Vec<u8>,
    /// Extension matching `bytes`, without the dot; differs from the source
    /// extension when the page was re-encoded
    pub extension: String,
    pub source_path: PathBuf,
}

impl ValidatedPage {
    /// Filename the platform sees: the source stem with the final extension
    pub fn upload_filename(&self) -> String {
        let stem = self
            .source_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("page");
        format!("{}.{}", stem, self.extension)
    }
}

#[derive(Debug)]
pub struct ValidatedChapter {
    pub pages: Vec<ValidatedPage>,
    pub total_bytes: u64,
}

#[derive(Debug, Error)]
pub enum ChapterRejection {
    #[error("chapter has no images")]
    NoPages,
    #[error("chapter has {0} pages, limit is 500")]
    TooManyPages(usize),
    #[error("empty image file: {0}")]
    EmptyImage(PathBuf),
    #[error("image dimensions exceed 10000px: {path} ({width}x{height})")]
    DimensionsExceeded {
        path: PathBuf,
        width: u32,
        height: u32,
    },
    #[error("image larger than 20 MiB after re-encoding: {0}")]
    ImageTooLarge(PathBuf),
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to process image {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("failed to re-encode {path}: {source}")]
    JpegEncode {
        path: PathBuf,
        #[source]
        source: jpeg_encoder::EncodingError,
    },
    #[error("chapter is {0} bytes after processing, limit is 200 MiB")]
    ChapterTooLarge(u64),
    #[error("validation worker panicked")]
    WorkerPanic,
}

/// Check every frame of an animated GIF against the pixel ceiling. The
/// ceiling applies per frame, not to the assembled canvas.
fn check_gif_frames(path: &Path, bytes: &[u8]) -> Result<(), ChapterRejection> {
    let decoder = image::codecs::gif::GifDecoder::new(Cursor::new(bytes)).map_err(|source| {
        ChapterRejection::Image {
            path: path.to_path_buf(),
            source,
        }
    })?;

    for frame in decoder.into_frames() {
        let frame = frame.map_err(|source| ChapterRejection::Image {
            path: path.to_path_buf(),
            source,
        })?;
        let (width, height) = frame.buffer().dimensions();
        if width > MAX_FRAME_EDGE || height > MAX_FRAME_EDGE {
            return Err(ChapterRejection::DimensionsExceeded {
                path: path.to_path_buf(),
                width,
                height,
            });
        }
    }
    Ok(())
}

/// Validate one page, re-encoding when the format or size requires it.
///
/// Re-encoding picks PNG when the source carries alpha, progressive JPEG at
/// fixed quality otherwise. Pixel and byte ceilings are checked
/// independently: an image over the pixel limit is rejected outright, never
/// converted.
pub fn validate_page(path: &Path) -> Result<ValidatedPage, ChapterRejection> {
    let bytes = std::fs::read(path).map_err(|source| ChapterRejection::Io {
        path: path.to_path_buf(),
        source,
    })?;
    if bytes.is_empty() {
        return Err(ChapterRejection::EmptyImage(path.to_path_buf()));
    }

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    if ext == "gif" {
        check_gif_frames(path, &bytes)?;
    }

    let img = image::ImageReader::new(Cursor::new(&bytes))
        .with_guessed_format()
        .map_err(|source| ChapterRejection::Io {
            path: path.to_path_buf(),
            source,
        })?
        .decode()
        .map_err(|source| ChapterRejection::Image {
            path: path.to_path_buf(),
            source,
        })?;

    if ext != "gif" {
        let (width, height) = (img.width(), img.height());
        if width > MAX_FRAME_EDGE || height > MAX_FRAME_EDGE {
            return Err(ChapterRejection::DimensionsExceeded {
                path: path.to_path_buf(),
                width,
                height,
            });
        }
    }

    let needs_format_conversion =
        !PUBLISH_EXTENSIONS.contains(&ext.as_str()) && CONVERTIBLE_EXTENSIONS.contains(&ext.as_str());

    let (bytes, extension) = if needs_format_conversion || bytes.len() > MAX_IMAGE_BYTES {
        if img.color().has_alpha() {
            let mut out = Vec::new();
            img.write_to(&mut Cursor::new(&mut out), image::ImageFormat::Png)
                .map_err(|source| ChapterRejection::Image {
                    path: path.to_path_buf(),
                    source,
                })?;
            (out, "png".to_string())
        } else {
            let rgb = img.to_rgb8();
            let mut out = Vec::new();
            let mut encoder = jpeg_encoder::Encoder::new(&mut out, JPEG_QUALITY);
            encoder.set_progressive(true);
            // Dimensions fit u16: the pixel ceiling was checked above
            encoder
                .encode(
                    rgb.as_raw(),
                    rgb.width() as u16,
                    rgb.height() as u16,
                    jpeg_encoder::ColorType::Rgb,
                )
                .map_err(|source| ChapterRejection::JpegEncode {
                    path: path.to_path_buf(),
                    source,
                })?;
            (out, "jpg".to_string())
        }
    } else {
        (bytes, ext)
    };

    if bytes.len() > MAX_IMAGE_BYTES {
        return Err(ChapterRejection::ImageTooLarge(path.to_path_buf()));
    }

    Ok(ValidatedPage {
        bytes,
        extension,
        source_path: path.to_path_buf(),
    })
}

/// Validate every page of a chapter on a bounded pool of blocking workers.
///
/// The count ceiling is enforced before any file is opened. Results are
/// re-ordered by source index, so output order always matches the
/// descriptor's natural page order.
pub async fn validate_chapter(
    descriptor: &ChapterDescriptor,
) -> Result<ValidatedChapter, ChapterRejection> {
    if descriptor.images.is_empty() {
        return Err(ChapterRejection::NoPages);
    }
    if descriptor.images.len() > MAX_PAGES_PER_CHAPTER {
        return Err(ChapterRejection::TooManyPages(descriptor.images.len()));
    }

    let mut pending = descriptor.images.iter().cloned().enumerate();
    let mut workers = FuturesUnordered::new();
    let mut slots: Vec<Option<ValidatedPage>> = Vec::new();
    slots.resize_with(descriptor.images.len(), || None);

    loop {
        if workers.len() < MAX_DECODE_WORKERS {
            match pending.next() {
                Some((index, path)) => {
                    workers.push(tokio::task::spawn_blocking(move || {
                        (index, validate_page(&path))
                    }));
                }
                None => break,
            }
        } else {
            // At capacity, wait for one to complete
            match workers.next().await {
                Some(Ok((index, Ok(page)))) => slots[index] = Some(page),
                Some(Ok((_, Err(rejection)))) => return Err(rejection),
                Some(Err(_)) => return Err(ChapterRejection::WorkerPanic),
                None => break,
            }
        }
    }

    // Drain remaining workers
    while let Some(result) = workers.next().await {
        match result {
            Ok((index, Ok(page))) => slots[index] = Some(page),
            Ok((_, Err(rejection))) => return Err(rejection),
            Err(_) => return Err(ChapterRejection::WorkerPanic),
        }
    }

    let pages: Vec<ValidatedPage> = slots.into_iter().flatten().collect();
    if pages.len() != descriptor.images.len() {
        return Err(ChapterRejection::WorkerPanic);
    }

    let total_bytes: u64 = pages.iter().map(|p| p.bytes.len() as u64).sum();
    if total_bytes > MAX_CHAPTER_BYTES {
        return Err(ChapterRejection::ChapterTooLarge(total_bytes));
    }

    info!(
        "Validated {} page(s), {} bytes total: {}",
        pages.len(),
        total_bytes,
        descriptor.source_path.display()
    );

    Ok(ValidatedChapter { pages, total_bytes })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, Rgba, RgbImage, RgbaImage};

    fn descriptor_with_images(images: Vec<PathBuf>) -> ChapterDescriptor {
        ChapterDescriptor {
            source_path: PathBuf::from("/tmp/chapter"),
            title_id: "11111111-1111-4111-8111-111111111111".to_string(),
            group_ids: vec![],
            language: "en".to_string(),
            chapter: Some("1".to_string()),
            volume: None,
            chapter_title: None,
            publish_date: None,
            is_oneshot: false,
            images,
        }
    }

    fn write_rgb_image(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
        let path = dir.join(name);
        let img = RgbImage::from_pixel(width, height, Rgb([120u8, 80, 40]));
        img.save(&path).unwrap();
        path
    }

    #[tokio::test]
    async fn test_empty_chapter_is_rejected() {
        let err = validate_chapter(&descriptor_with_images(vec![]))
            .await
            .unwrap_err();
        assert!(matches!(err, ChapterRejection::NoPages));
    }

    #[tokio::test]
    async fn test_overlong_chapter_rejected_before_opening_images() {
        // 501 paths that do not exist: the count check must fire first
        let images: Vec<PathBuf> = (0..501)
            .map(|i| PathBuf::from(format!("/nonexistent/{i}.png")))
            .collect();
        let err = validate_chapter(&descriptor_with_images(images))
            .await
            .unwrap_err();
        assert!(matches!(err, ChapterRejection::TooManyPages(501)));
    }

    #[test]
    fn test_empty_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.png");
        std::fs::write(&path, []).unwrap();

        let err = validate_page(&path).unwrap_err();
        assert!(matches!(err, ChapterRejection::EmptyImage(_)));
    }

    #[test]
    fn test_accepted_format_passes_through_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_rgb_image(dir.path(), "01.png", 4, 4);
        let original = std::fs::read(&path).unwrap();

        let page = validate_page(&path).unwrap();
        assert_eq!(page.extension, "png");
        assert_eq!(page.bytes, original);
        assert_eq!(page.upload_filename(), "01.png");
    }

    #[test]
    fn test_convertible_format_without_alpha_becomes_jpeg() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_rgb_image(dir.path(), "02.bmp", 4, 4);

        let page = validate_page(&path).unwrap();
        assert_eq!(page.extension, "jpg");
        assert_eq!(page.upload_filename(), "02.jpg");
        // JPEG magic
        assert_eq!(&page.bytes[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn test_convertible_format_with_alpha_becomes_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("03.tiff");
        let img = RgbaImage::from_pixel(4, 4, Rgba([120u8, 80, 40, 128]));
        img.save(&path).unwrap();

        let page = validate_page(&path).unwrap();
        assert_eq!(page.extension, "png");
        // PNG magic
        assert_eq!(&page.bytes[..4], &[0x89, b'P', b'N', b'G']);
    }

    #[test]
    fn test_oversized_accepted_format_is_reencoded() {
        // Noise does not deflate: a 3000x3000 random-ish PNG lands well over
        // the 20 MiB cap, and its quality-80 JPEG lands well under it
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("huge.png");
        let mut state = 0x2545F4914F6CDD1Du64;
        let img = RgbImage::from_fn(3000, 3000, |_, _| {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let v = (state >> 32) as u32;
            Rgb([v as u8, (v >> 8) as u8, (v >> 16) as u8])
        });
        img.save(&path).unwrap();
        assert!(std::fs::metadata(&path).unwrap().len() > MAX_IMAGE_BYTES as u64);

        let page = validate_page(&path).unwrap();
        assert_eq!(page.extension, "jpg");
        assert!(page.bytes.len() <= MAX_IMAGE_BYTES);
    }

    #[test]
    fn test_still_over_cap_after_conversion_is_rejected() {
        // Alpha routes the re-encode to PNG, and noise does not deflate, so
        // the converted page is still over the 20 MiB cap
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("huge.tiff");
        let mut state = 0x9E3779B97F4A7C15u64;
        let img = RgbaImage::from_fn(3000, 3000, |_, _| {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let v = (state >> 32) as u32;
            Rgba([v as u8, (v >> 8) as u8, (v >> 16) as u8, (v >> 24) as u8])
        });
        img.save(&path).unwrap();

        let err = validate_page(&path).unwrap_err();
        assert!(matches!(err, ChapterRejection::ImageTooLarge(_)));
    }

    #[test]
    fn test_animated_gif_passes_per_frame_checks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("anim.gif");
        let file = std::fs::File::create(&path).unwrap();
        let mut encoder = image::codecs::gif::GifEncoder::new(file);
        encoder
            .encode_frames(vec![
                image::Frame::new(RgbaImage::from_pixel(4, 4, Rgba([255u8, 0, 0, 255]))),
                image::Frame::new(RgbaImage::from_pixel(4, 4, Rgba([0u8, 255, 0, 255]))),
            ])
            .unwrap();
        drop(encoder);

        let page = validate_page(&path).unwrap();
        assert_eq!(page.extension, "gif");
    }

    #[test]
    fn test_gif_with_oversized_frame_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wide.gif");
        let file = std::fs::File::create(&path).unwrap();
        let mut encoder = image::codecs::gif::GifEncoder::new(file);
        encoder
            .encode_frames(vec![image::Frame::new(RgbaImage::from_pixel(
                MAX_FRAME_EDGE + 1,
                1,
                Rgba([255u8, 0, 0, 255]),
            ))])
            .unwrap();
        drop(encoder);

        let err = validate_page(&path).unwrap_err();
        assert!(matches!(
            err,
            ChapterRejection::DimensionsExceeded { width, height: 1, .. } if width == MAX_FRAME_EDGE + 1
        ));
    }

    #[test]
    fn test_oversized_dimensions_are_rejected_not_converted() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_rgb_image(dir.path(), "wide.png", MAX_FRAME_EDGE + 1, 1);

        let err = validate_page(&path).unwrap_err();
        assert!(matches!(
            err,
            ChapterRejection::DimensionsExceeded { width, height: 1, .. } if width == MAX_FRAME_EDGE + 1
        ));
    }

    #[tokio::test]
    async fn test_one_bad_page_rejects_the_whole_chapter() {
        let dir = tempfile::tempdir().unwrap();
        let good = write_rgb_image(dir.path(), "1.png", 4, 4);
        let bad = dir.path().join("2.png");
        std::fs::write(&bad, []).unwrap();

        let err = validate_chapter(&descriptor_with_images(vec![good, bad]))
            .await
            .unwrap_err();
        assert!(matches!(err, ChapterRejection::EmptyImage(_)));
    }

    #[tokio::test]
    async fn test_pages_come_back_in_descriptor_order() {
        let dir = tempfile::tempdir().unwrap();
        let images: Vec<PathBuf> = (1..=9)
            .map(|i| write_rgb_image(dir.path(), &format!("{i}.png"), 4, 4))
            .collect();

        let validated = validate_chapter(&descriptor_with_images(images.clone()))
            .await
            .unwrap();
        let order: Vec<PathBuf> = validated.pages.iter().map(|p| p.source_path.clone()).collect();
        assert_eq!(order, images);
    }
}
