//! What renderers need from the layer that owns them.
//!
//! A renderer holds its layer as `Rc<dyn ...Host>`; the layer in turn owns
//! the renderer. Everything here is queried on the render thread only.

use crate::core::{
    bounds::Bounds,
    config::{CanvasLayerOptions, TileLayerOptions},
    events::LayerEvent,
    geo::Size,
    viewport::MapView,
};
use crate::layers::tile::TileGrid;
use crate::prelude::Rc;
use crate::rendering::context::RenderContext;

pub trait LayerHost {
    fn id(&self) -> String;

    /// The map the layer is added to, if any
    fn map(&self) -> Option<Rc<dyn MapView>>;

    fn is_visible(&self) -> bool;

    /// Emit an event on the layer's event channel
    fn fire(&self, event: LayerEvent);
}

pub trait TileLayerHost: LayerHost {
    fn tile_options(&self) -> TileLayerOptions;

    /// Tiles needed for the current view at `zoom`, or at the layer's
    /// current tile zoom when `None`
    fn tile_grid(&self, zoom: Option<u8>) -> Option<TileGrid>;

    /// Integer zoom the layer fetches tiles at for the current map zoom
    fn tile_zoom(&self) -> u8;

    fn tile_size(&self) -> Size;
}

pub trait CanvasLayerHost: LayerHost {
    fn canvas_options(&self) -> CanvasLayerOptions;

    /// Clip mask applied while drawing
    fn mask(&self) -> Option<Rc<dyn ClipMask>>;

    /// Whether the layer has nothing to draw
    fn is_empty(&self) -> bool {
        false
    }
}

/// A geometry that restricts where a canvas layer may paint
pub trait ClipMask {
    /// Extent of the mask in 2D point coordinates
    fn extent_2d(&self) -> Bounds;

    /// Paint the mask's outline as the current clip of `ctx`
    fn paint_clip(&self, ctx: &mut RenderContext, map: &dyn MapView);

    fn on_zoom_end(&self) {}
}
