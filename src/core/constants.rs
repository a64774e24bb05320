//! Core constants shared by the tile and canvas renderers.
//! Keeping them in a single place makes it easier to tweak engine-wide magic numbers.

/// Default square tile size in pixels.
pub const TILE_SIZE: u32 = 256;

/// Duration of the linear tile fade-in, in milliseconds.
pub const FADE_DURATION_MS: u64 = 200;

/// Extra wait on top of the zoom animation duration before a deferred prune,
/// so the prune lands after the last fade-in.
pub const PRUNE_PADDING_MS: u64 = 100;

/// Zoom animation duration used when the map does not configure one.
pub const DEFAULT_ZOOM_ANIMATION_MS: u64 = 250;

/// Map animations at least this long switch tiles to interaction drawing.
pub const DEFAULT_DURATION_TO_ANIMATE_MS: u64 = 300;

/// 1x1 transparent GIF used to release an in-flight image request.
pub const EMPTY_IMAGE_URL: &str =
    "data:image/gif;base64,R0lGODlhAQABAAD/ACwAAAAAAQABAAACADs=";

/// Icon size used when an SVG resource carries no intrinsic size.
pub const DEFAULT_ICON_SIZE: (u32, u32) = (20, 20);

/// Largest edge, in pixels, an SVG resource is rasterized at.
pub const MAX_SVG_RASTER_SIZE: u32 = 8192;

/// Largest edge, in device pixels, of a canvas surface.
pub const MAX_SURFACE_SIZE: u32 = 16_384;
