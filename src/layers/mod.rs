//! Layer renderers and the host interfaces they are driven through

pub mod base;
pub mod canvas;
pub mod tile;

pub use base::{CanvasLayerHost, ClipMask, LayerHost, TileLayerHost};
pub use canvas::{CanvasImage, CanvasPainter, CanvasRenderer, ResourceBatch};
pub use tile::TileLayerRenderer;
