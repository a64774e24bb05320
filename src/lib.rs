//! # maplayer
//!
//! Layer renderers for a pannable, zoomable, rotatable map surface.
//!
//! The crate provides the stateful core behind map layers:
//! a tile lifecycle manager that creates per-zoom level containers, loads
//! and fades tiles in, and prunes stale tiles; a canvas render-loop
//! coordinator that makes sure external resources are loaded before
//! drawing and debounces draws onto the display refresh; and the gesture
//! bookkeeping both share while the map zooms, pans or rotates.
//!
//! Everything runs on one thread. The host drives renderers by calling
//! [`LayerRenderer::tick`] once per display refresh and forwarding map
//! events to the `on_*` handlers.

pub mod core;
pub mod layers;
pub mod prelude;
pub mod rendering;
pub mod runtime;
pub mod traits;
pub use crate::core::constants;

// Re-export public API
pub use core::{
    bounds::Bounds,
    config::{CanvasLayerOptions, MapOptions, TileLayerOptions},
    events::LayerEvent,
    geo::{Point, Size, TileCoord, TileId},
    viewport::{MapView, Viewport},
};

pub use layers::{
    base::{CanvasLayerHost, ClipMask, LayerHost, TileLayerHost},
    canvas::{CanvasPainter, CanvasRenderer},
    tile::{
        loader::{ImageLoader, LoadError, LoadRequest, LoadTask},
        TileGrid, TileLayerRenderer,
    },
};

pub use rendering::{
    context::{RenderContext, SurfaceError},
    resources::{ResourceCache, ResourceKey},
};

pub use traits::LayerRenderer;

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, MapError>;

/// Common error types
#[derive(Debug, thiserror::Error)]
pub enum MapError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Surface error: {0}")]
    Surface(#[from] SurfaceError),

    #[error("Load error: {0}")]
    Load(#[from] LoadError),

    #[error("Render error: {0}")]
    Render(String),

    #[error("Layer error: {0}")]
    Layer(String),
}

/// Error type alias for convenience
pub type Error = MapError;
