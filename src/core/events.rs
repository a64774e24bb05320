//! Events emitted by renderers through their owning layer.

use crate::core::geo::TileId;
use crate::layers::tile::loader::LoadError;
use std::fmt;

/// Snapshot of a tile handed out with tile events
#[derive(Debug, Clone, PartialEq)]
pub struct TileInfo {
    pub id: TileId,
    pub url: String,
    pub zoom: u8,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LayerEvent {
    /// External resources of a canvas layer finished loading
    ResourceLoad,
    RenderStart,
    RenderEnd,
    LayerLoad,
    TileLoad { tile: TileInfo },
    TileError { tile: TileInfo, error: LoadError },
    TileUnload { tile: TileInfo },
}

impl LayerEvent {
    pub fn name(&self) -> &'static str {
        match self {
            LayerEvent::ResourceLoad => "resourceload",
            LayerEvent::RenderStart => "renderstart",
            LayerEvent::RenderEnd => "renderend",
            LayerEvent::LayerLoad => "layerload",
            LayerEvent::TileLoad { .. } => "tileload",
            LayerEvent::TileError { .. } => "tileerror",
            LayerEvent::TileUnload { .. } => "tileunload",
        }
    }
}

impl fmt::Display for LayerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
