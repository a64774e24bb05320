//! Raster drawing surface owned by a canvas renderer.
//!
//! Coordinates passed in are CSS pixels; the surface itself is a
//! `tiny_skia::Pixmap` allocated in device pixels (`css * pixel_ratio`).

use crate::core::{
    bounds::Bounds,
    constants::MAX_SURFACE_SIZE,
    geo::{Point, Size},
};
use image::{Rgba, RgbaImage};
use std::str::FromStr;
use tiny_skia::{
    BlendMode, Color, ColorU8, FillRule, FilterQuality, Mask, Paint, PathBuilder, Pixmap,
    PixmapPaint, Rect, Transform,
};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SurfaceError {
    /// Pixels cannot be read back because cross-origin data was drawn
    #[error("surface is tainted by cross-origin data")]
    Tainted,
    #[error("point ({x}, {y}) is outside the surface")]
    OutOfBounds { x: f64, y: f64 },
    #[error("cannot allocate a {width}x{height} surface")]
    Allocation { width: u32, height: u32 },
}

/// How drawn pixels are combined with the pixels already on the surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompositeOperation {
    #[default]
    SourceOver,
    DestinationOver,
    DestinationOut,
    Lighter,
    Copy,
}

impl CompositeOperation {
    pub fn blend_mode(self) -> BlendMode {
        match self {
            CompositeOperation::SourceOver => BlendMode::SourceOver,
            CompositeOperation::DestinationOver => BlendMode::DestinationOver,
            CompositeOperation::DestinationOut => BlendMode::DestinationOut,
            CompositeOperation::Lighter => BlendMode::Plus,
            CompositeOperation::Copy => BlendMode::Source,
        }
    }
}

impl FromStr for CompositeOperation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "source-over" => Ok(CompositeOperation::SourceOver),
            "destination-over" => Ok(CompositeOperation::DestinationOver),
            "destination-out" => Ok(CompositeOperation::DestinationOut),
            "lighter" => Ok(CompositeOperation::Lighter),
            "copy" => Ok(CompositeOperation::Copy),
            other => Err(format!("unsupported composite operation: {other}")),
        }
    }
}

pub struct RenderContext {
    surface: Pixmap,
    pixel_ratio: f64,
    composite: CompositeOperation,
    /// Active clip in CSS pixels
    clip: Option<Bounds>,
    /// Device-pixel coverage of `clip`
    mask: Option<Mask>,
    saved: Vec<Option<Bounds>>,
    tainted: bool,
}

impl std::fmt::Debug for RenderContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderContext")
            .field("width", &self.surface.width())
            .field("height", &self.surface.height())
            .field("pixel_ratio", &self.pixel_ratio)
            .field("composite", &self.composite)
            .field("clip", &self.clip)
            .field("tainted", &self.tainted)
            .finish()
    }
}

impl RenderContext {
    pub fn new(size: Size, pixel_ratio: f64) -> Result<Self, SurfaceError> {
        let (width, height) = device_size(size, pixel_ratio);
        Ok(Self {
            surface: new_surface(width, height)?,
            pixel_ratio,
            composite: CompositeOperation::default(),
            clip: None,
            mask: None,
            saved: Vec::new(),
            tainted: false,
        })
    }

    /// Width in device pixels
    pub fn width(&self) -> u32 {
        self.surface.width()
    }

    /// Height in device pixels
    pub fn height(&self) -> u32 {
        self.surface.height()
    }

    pub fn pixel_ratio(&self) -> f64 {
        self.pixel_ratio
    }

    /// Surface size in CSS pixels
    pub fn css_size(&self) -> Size {
        Size::new(
            self.width() as f64 / self.pixel_ratio,
            self.height() as f64 / self.pixel_ratio,
        )
    }

    /// Grow the surface to fit `size`. Never shrinks; returns whether the
    /// surface was reallocated.
    pub fn resize(&mut self, size: Size, pixel_ratio: f64) -> Result<bool, SurfaceError> {
        let (width, height) = device_size(size, pixel_ratio);
        if width <= self.width() && height <= self.height() && pixel_ratio == self.pixel_ratio {
            return Ok(false);
        }
        self.surface = new_surface(width.max(self.width()), height.max(self.height()))?;
        self.pixel_ratio = pixel_ratio;
        self.clip = None;
        self.mask = None;
        self.saved.clear();
        Ok(true)
    }

    pub fn set_composite_operation(&mut self, op: CompositeOperation) {
        self.composite = op;
    }

    pub fn composite_operation(&self) -> CompositeOperation {
        self.composite
    }

    /// Wipe every pixel. Clearing also lifts the taint, as nothing foreign
    /// remains on the surface.
    pub fn clear(&mut self) {
        self.surface.fill(Color::TRANSPARENT);
        self.tainted = false;
    }

    pub fn save(&mut self) {
        self.saved.push(self.clip);
    }

    pub fn restore(&mut self) {
        if let Some(clip) = self.saved.pop() {
            self.set_clip(clip);
        }
    }

    /// Intersect the current clip with `rect`
    pub fn clip_rect(&mut self, rect: Bounds) {
        let clip = match self.clip {
            Some(current) => current
                .intersection(&rect)
                .unwrap_or(Bounds::new(rect.min, rect.min)),
            None => rect,
        };
        self.set_clip(Some(clip));
    }

    pub fn clip(&self) -> Option<Bounds> {
        self.clip
    }

    pub fn save_depth(&self) -> usize {
        self.saved.len()
    }

    /// Record that cross-origin pixels were drawn
    pub fn mark_tainted(&mut self) {
        self.tainted = true;
    }

    pub fn is_tainted(&self) -> bool {
        self.tainted
    }

    pub fn fill_rect(&mut self, rect: Bounds, color: Rgba<u8>) {
        if self.clipped_out() {
            return;
        }
        let Some(rect) = css_rect(rect) else {
            return;
        };
        let mut paint = Paint::default();
        paint.set_color_rgba8(color[0], color[1], color[2], color[3]);
        paint.blend_mode = self.composite.blend_mode();
        paint.anti_alias = false;
        let transform = self.device_transform();
        self.surface
            .fill_rect(rect, &paint, transform, self.mask.as_ref());
    }

    /// Draw `image` with its top-left corner at `at`, stretched to `size`
    /// CSS pixels when given
    pub fn draw_image(&mut self, image: &RgbaImage, at: Point, size: Option<Size>, opacity: f32) {
        let css = size.unwrap_or(Size::new(image.width() as f64, image.height() as f64));
        if css.is_empty() || self.clipped_out() {
            return;
        }
        let Some(source) = rgba_to_pixmap(image) else {
            return;
        };
        let ratio = self.pixel_ratio as f32;
        let transform = Transform::from_row(
            css.width as f32 / image.width() as f32 * ratio,
            0.0,
            0.0,
            css.height as f32 / image.height() as f32 * ratio,
            at.x as f32 * ratio,
            at.y as f32 * ratio,
        );
        let paint = PixmapPaint {
            opacity: opacity.clamp(0.0, 1.0),
            blend_mode: self.composite.blend_mode(),
            quality: FilterQuality::Nearest,
        };
        self.surface
            .draw_pixmap(0, 0, source.as_ref(), &paint, transform, self.mask.as_ref());
    }

    /// Alpha of the pixel under a CSS point
    pub fn pixel_alpha(&self, point: Point) -> Result<u8, SurfaceError> {
        if self.tainted {
            return Err(SurfaceError::Tainted);
        }
        let x = (point.x * self.pixel_ratio).floor();
        let y = (point.y * self.pixel_ratio).floor();
        let out_of_bounds = SurfaceError::OutOfBounds {
            x: point.x,
            y: point.y,
        };
        if x < 0.0 || y < 0.0 {
            return Err(out_of_bounds);
        }
        self.surface
            .pixel(x as u32, y as u32)
            .map(|pixel| pixel.alpha())
            .ok_or(out_of_bounds)
    }

    pub fn image(&self) -> &Pixmap {
        &self.surface
    }

    fn device_transform(&self) -> Transform {
        let ratio = self.pixel_ratio as f32;
        Transform::from_scale(ratio, ratio)
    }

    /// True when the clip leaves nothing to draw into
    fn clipped_out(&self) -> bool {
        self.clip.is_some_and(|clip| clip.size().is_empty())
    }

    fn set_clip(&mut self, clip: Option<Bounds>) {
        self.clip = clip;
        self.mask = clip.and_then(|clip| {
            let rect = css_rect(clip)?;
            let mut mask = Mask::new(self.width(), self.height())?;
            let path = PathBuilder::from_rect(rect);
            mask.fill_path(&path, FillRule::Winding, false, self.device_transform());
            Some(mask)
        });
    }
}

fn device_size(size: Size, pixel_ratio: f64) -> (u32, u32) {
    (
        (size.width * pixel_ratio).round().max(0.0) as u32,
        (size.height * pixel_ratio).round().max(0.0) as u32,
    )
}

/// A pixmap cannot be empty, so zero-sized surfaces get a single pixel
fn new_surface(width: u32, height: u32) -> Result<Pixmap, SurfaceError> {
    let (width, height) = (width.max(1), height.max(1));
    if width > MAX_SURFACE_SIZE || height > MAX_SURFACE_SIZE {
        return Err(SurfaceError::Allocation { width, height });
    }
    Pixmap::new(width, height).ok_or(SurfaceError::Allocation { width, height })
}

fn css_rect(bounds: Bounds) -> Option<Rect> {
    if bounds.size().is_empty() {
        return None;
    }
    Rect::from_ltrb(
        bounds.min.x as f32,
        bounds.min.y as f32,
        bounds.max.x as f32,
        bounds.max.y as f32,
    )
}

/// Premultiplied copy of a straight-alpha image
fn rgba_to_pixmap(image: &RgbaImage) -> Option<Pixmap> {
    let mut pixmap = Pixmap::new(image.width(), image.height())?;
    for (dst, src) in pixmap.pixels_mut().iter_mut().zip(image.pixels()) {
        *dst = ColorU8::from_rgba(src[0], src[1], src[2], src[3]).premultiply();
    }
    Some(pixmap)
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);

    #[test]
    fn test_surface_uses_device_pixels() {
        let ctx = RenderContext::new(Size::new(100.0, 50.0), 2.0).unwrap();
        assert_eq!((ctx.width(), ctx.height()), (200, 100));
        assert_eq!(ctx.css_size(), Size::new(100.0, 50.0));
    }

    #[test]
    fn test_resize_only_grows() {
        let mut ctx = RenderContext::new(Size::new(100.0, 100.0), 1.0).unwrap();
        assert_eq!(ctx.resize(Size::new(50.0, 50.0), 1.0), Ok(false));
        assert_eq!(ctx.width(), 100);
        assert_eq!(ctx.resize(Size::new(150.0, 80.0), 1.0), Ok(true));
        assert_eq!((ctx.width(), ctx.height()), (150, 100));
    }

    #[test]
    fn test_clip_limits_fill_and_restore_resets_it() {
        let mut ctx = RenderContext::new(Size::new(10.0, 10.0), 1.0).unwrap();
        ctx.save();
        ctx.clip_rect(Bounds::from_coords(0.0, 0.0, 5.0, 5.0));
        ctx.fill_rect(Bounds::from_coords(0.0, 0.0, 10.0, 10.0), RED);
        ctx.restore();

        assert_eq!(ctx.pixel_alpha(Point::new(2.0, 2.0)), Ok(255));
        assert_eq!(ctx.pixel_alpha(Point::new(7.0, 7.0)), Ok(0));
        assert_eq!(ctx.clip(), None);
        assert_eq!(ctx.save_depth(), 0);
    }

    #[test]
    fn test_tainted_surface_refuses_readback() {
        let mut ctx = RenderContext::new(Size::new(10.0, 10.0), 1.0).unwrap();
        ctx.fill_rect(Bounds::from_coords(0.0, 0.0, 10.0, 10.0), RED);
        ctx.mark_tainted();
        assert_eq!(ctx.pixel_alpha(Point::new(1.0, 1.0)), Err(SurfaceError::Tainted));
    }

    #[test]
    fn test_out_of_bounds_readback() {
        let ctx = RenderContext::new(Size::new(10.0, 10.0), 1.0).unwrap();
        assert!(matches!(
            ctx.pixel_alpha(Point::new(10.0, 0.0)),
            Err(SurfaceError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn test_draw_image_with_opacity() {
        let mut ctx = RenderContext::new(Size::new(4.0, 4.0), 1.0).unwrap();
        let image = RgbaImage::from_pixel(2, 2, RED);
        ctx.draw_image(&image, Point::new(1.0, 1.0), None, 0.5);

        assert_eq!(ctx.pixel_alpha(Point::new(0.0, 0.0)), Ok(0));
        assert!(matches!(ctx.pixel_alpha(Point::new(1.0, 1.0)), Ok(127..=128)));
        assert!(matches!(ctx.pixel_alpha(Point::new(2.0, 2.0)), Ok(127..=128)));
        assert_eq!(ctx.pixel_alpha(Point::new(3.0, 3.0)), Ok(0));
    }

    #[test]
    fn test_draw_image_scales_to_size() {
        let mut ctx = RenderContext::new(Size::new(8.0, 8.0), 2.0).unwrap();
        let image = RgbaImage::from_pixel(1, 1, RED);
        ctx.draw_image(&image, Point::new(1.0, 1.0), Some(Size::new(2.0, 2.0)), 1.0);

        assert_eq!(ctx.pixel_alpha(Point::new(1.0, 1.0)), Ok(255));
        assert_eq!(ctx.pixel_alpha(Point::new(2.5, 2.5)), Ok(255));
        assert_eq!(ctx.pixel_alpha(Point::new(3.5, 3.5)), Ok(0));
    }

    #[test]
    fn test_destination_out_erases() {
        let mut ctx = RenderContext::new(Size::new(4.0, 4.0), 1.0).unwrap();
        ctx.fill_rect(Bounds::from_coords(0.0, 0.0, 4.0, 4.0), RED);
        ctx.set_composite_operation(CompositeOperation::DestinationOut);
        ctx.fill_rect(Bounds::from_coords(0.0, 0.0, 2.0, 4.0), RED);

        assert_eq!(ctx.pixel_alpha(Point::new(1.0, 1.0)), Ok(0));
        assert_eq!(ctx.pixel_alpha(Point::new(3.0, 1.0)), Ok(255));
    }

    #[test]
    fn test_empty_clip_blocks_drawing() {
        let mut ctx = RenderContext::new(Size::new(10.0, 10.0), 1.0).unwrap();
        ctx.clip_rect(Bounds::from_coords(0.0, 0.0, 2.0, 2.0));
        ctx.clip_rect(Bounds::from_coords(5.0, 5.0, 8.0, 8.0));
        ctx.fill_rect(Bounds::from_coords(0.0, 0.0, 10.0, 10.0), RED);
        assert_eq!(ctx.pixel_alpha(Point::new(6.0, 6.0)), Ok(0));
        assert_eq!(ctx.pixel_alpha(Point::new(1.0, 1.0)), Ok(0));
    }

    #[test]
    fn test_oversized_surface_is_refused() {
        assert!(matches!(
            RenderContext::new(Size::new(20_000.0, 10.0), 1.0),
            Err(SurfaceError::Allocation { .. })
        ));
        let mut ctx = RenderContext::new(Size::new(10.0, 10.0), 1.0).unwrap();
        assert!(ctx.resize(Size::new(10.0, 20_000.0), 1.0).is_err());
        assert_eq!(ctx.height(), 10);
    }

    #[test]
    fn test_composite_operation_parsing() {
        assert_eq!(
            "destination-over".parse::<CompositeOperation>(),
            Ok(CompositeOperation::DestinationOver)
        );
        assert!("multiply".parse::<CompositeOperation>().is_err());
    }
}
