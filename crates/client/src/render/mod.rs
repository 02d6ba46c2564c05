//! Thumbnail rendering.
//!
//! Decodes any supported image (format sniffed from content), shrinks it to
//! fit a square bound, optionally stamps a caption near the bottom-left
//! corner, and re-encodes as JPEG.

pub mod caption;

use std::io::Cursor;

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageReader, Rgb, RgbImage};
use mediaserver_core::{AppConfig, Bounds, Error, THUMBNAIL_MIME, Thumbnail};

pub use caption::{draw_text, fit_caption};

/// Padding subtracted from each side before a caption is considered.
const CAPTION_PADDING: u32 = 16;

/// Minimum padded extent on both axes for a caption to be drawn.
const CAPTION_MIN_EXTENT: u32 = 24;

/// Renderer configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderConfig {
    /// Maximum width and height of the output (default: 256)
    pub size: u32,

    /// JPEG quality, 1-100 (default: 90)
    pub quality: u8,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self { size: 256, quality: 90 }
    }
}

impl From<&AppConfig> for RenderConfig {
    fn from(config: &AppConfig) -> Self {
        Self { size: config.thumbnail_size, quality: config.thumbnail_quality }
    }
}

/// Largest dimensions within `max` x `max` with the source aspect ratio.
///
/// Never upscales. Each side is at least one pixel.
pub fn fit(width: u32, height: u32, max: u32) -> (u32, u32) {
    if width <= max && height <= max {
        return (width, height);
    }
    let (w, h, max) = (u64::from(width), u64::from(height), u64::from(max));
    let (nw, nh) = if w >= h { (max, (h * max + w / 2) / w) } else { ((w * max + h / 2) / h, max) };
    (nw.max(1) as u32, nh.max(1) as u32)
}

/// Composite an image onto white and drop its alpha channel.
fn flatten(image: &DynamicImage) -> RgbImage {
    if !image.color().has_alpha() {
        return image.to_rgb8();
    }
    let rgba = image.to_rgba8();
    RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        let blend = |c: u8| ((u16::from(c) * u16::from(a) + 255 * (255 - u16::from(a)) + 127) / 255) as u8;
        Rgb([blend(r), blend(g), blend(b)])
    })
}

/// Turns image bytes into JPEG thumbnails.
#[derive(Debug, Clone, Default)]
pub struct ThumbnailRenderer {
    config: RenderConfig,
}

impl ThumbnailRenderer {
    pub fn new(config: RenderConfig) -> Self {
        Self { config }
    }

    /// Render a thumbnail, captioning it when `caption` is non-empty and
    /// the result is large enough to hold text.
    pub fn render(&self, data: &[u8], caption: Option<&str>) -> Result<Thumbnail, Error> {
        let reader = ImageReader::new(Cursor::new(data))
            .with_guessed_format()
            .map_err(|e| Error::DecodeFailed(format!("reading image: {e}")))?;
        let format = reader
            .format()
            .ok_or_else(|| Error::DecodeFailed("unrecognized image format".into()))?;
        let source = reader
            .decode()
            .map_err(|e| Error::DecodeFailed(format!("{format:?}: {e}")))?;

        let (source_width, source_height) = (source.width(), source.height());
        let (width, height) = fit(source_width, source_height, self.config.size);
        let resized = if (width, height) == (source_width, source_height) {
            source
        } else {
            source.resize_exact(width, height, FilterType::Nearest)
        };

        let mut canvas = flatten(&resized);
        if let Some(text) = caption.filter(|t| !t.is_empty()) {
            stamp_caption(&mut canvas, text);
        }

        let mut bytes = Vec::new();
        JpegEncoder::new_with_quality(&mut bytes, self.config.quality)
            .encode_image(&canvas)
            .map_err(|e| Error::EncodeFailed(format!("jpeg: {e}")))?;

        tracing::debug!(
            format = ?format,
            source_width,
            source_height,
            width,
            height,
            bytes = bytes.len(),
            "thumbnail rendered"
        );

        Ok(Thumbnail { bytes, mime: THUMBNAIL_MIME.to_string(), bounds: Bounds { width, height } })
    }

    /// [`Self::render`] on the blocking thread pool.
    pub async fn render_blocking(&self, data: Bytes, caption: Option<String>) -> Result<Thumbnail, Error> {
        let renderer = self.clone();
        tokio::task::spawn_blocking(move || renderer.render(&data, caption.as_deref()))
            .await
            .map_err(|e| Error::RenderAborted(e.to_string()))?
    }
}

/// Outlined caption: black shadow one pixel down-right, white on top.
fn stamp_caption(canvas: &mut RgbImage, text: &str) {
    let w = canvas.width().saturating_sub(CAPTION_PADDING);
    let h = canvas.height().saturating_sub(CAPTION_PADDING);
    if w <= CAPTION_MIN_EXTENT || h <= CAPTION_MIN_EXTENT {
        return;
    }

    let text = fit_caption(text, w);
    let h = i64::from(h);
    draw_text(canvas, 7, h + 7, Rgb([0, 0, 0]), &text);
    draw_text(canvas, 6, h + 6, Rgb([255, 255, 255]), &text);
}
