//! SVG rasterization for vector resources.
//!
//! Vector images are turned into plain rasters at load time, at the pixel
//! size the requester asked for, so the cache and painters only ever see
//! bitmaps.

use crate::core::constants::{DEFAULT_ICON_SIZE, MAX_SVG_RASTER_SIZE};
use image::{Rgba, RgbaImage};
use resvg::{tiny_skia, usvg};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SvgError {
    #[error("failed to parse SVG: {0}")]
    Parse(String),
    #[error("cannot rasterize SVG at {width}x{height}")]
    Size { width: u32, height: u32 },
}

/// Render `data` at `width` x `height`. A missing dimension follows the
/// intrinsic aspect ratio; both missing means the intrinsic size.
pub fn rasterize_svg(
    data: &[u8],
    width: Option<u32>,
    height: Option<u32>,
) -> Result<RgbaImage, SvgError> {
    let tree = usvg::Tree::from_data(data, &usvg::Options::default())
        .map_err(|e| SvgError::Parse(e.to_string()))?;

    let size = tree.size();
    let (source_width, source_height) = (size.width(), size.height());
    let (render_width, render_height) = target_size(source_width, source_height, width, height);
    if render_width == 0
        || render_height == 0
        || render_width > MAX_SVG_RASTER_SIZE
        || render_height > MAX_SVG_RASTER_SIZE
    {
        return Err(SvgError::Size {
            width: render_width,
            height: render_height,
        });
    }

    let mut pixmap = tiny_skia::Pixmap::new(render_width, render_height).ok_or(SvgError::Size {
        width: render_width,
        height: render_height,
    })?;
    let transform = tiny_skia::Transform::from_scale(
        render_width as f32 / source_width,
        render_height as f32 / source_height,
    );
    resvg::render(&tree, transform, &mut pixmap.as_mut());

    Ok(pixmap_to_rgba(&pixmap))
}

fn target_size(
    source_width: f32,
    source_height: f32,
    width: Option<u32>,
    height: Option<u32>,
) -> (u32, u32) {
    if source_width <= 0.0 || source_height <= 0.0 {
        return (
            width.unwrap_or(DEFAULT_ICON_SIZE.0),
            height.unwrap_or(DEFAULT_ICON_SIZE.1),
        );
    }
    let ratio = source_width / source_height;
    match (width, height) {
        (Some(w), Some(h)) => (w, h),
        (Some(w), None) => (w, (w as f32 / ratio).round() as u32),
        (None, Some(h)) => ((h as f32 * ratio).round() as u32, h),
        (None, None) => (source_width.ceil() as u32, source_height.ceil() as u32),
    }
}

/// Straight-alpha copy of a premultiplied pixmap
pub fn pixmap_to_rgba(pixmap: &tiny_skia::Pixmap) -> RgbaImage {
    let mut image = RgbaImage::new(pixmap.width(), pixmap.height());
    for (dst, src) in image.pixels_mut().zip(pixmap.pixels()) {
        let color = src.demultiply();
        *dst = Rgba([color.red(), color.green(), color.blue(), color.alpha()]);
    }
    image
}
