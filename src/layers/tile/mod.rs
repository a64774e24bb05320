//! Tile layer renderer
//!
//! This module keeps the tiles of a layer in step with the map view:
//! - per-zoom level containers, transformed as a unit during gestures
//! - tile creation, asynchronous loading and a linear fade-in
//! - pruning of stale tiles and levels, and abort of obsolete loads

mod gesture;
pub mod layer;
pub mod loader;
mod prune;
pub mod source;
pub mod trait_impl;
pub mod types;

pub use layer::TileLayerRenderer;
pub use loader::{ImageLoader, LoadError, LoadRequest, LoadTask};
pub use source::{grid_for_view, TileSource, UrlTemplateSource};
pub use types::{
    ContainerTransform, GridTile, LayerContainer, LevelContainer, Retention, Tile, TileGrid,
    TileImage, TilePhase,
};
