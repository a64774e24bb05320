//! Prelude module for common maplayer types and traits
//!
//! This module re-exports the most commonly used types, traits, and functions
//! for easy importing with `use maplayer::prelude::*;`

pub use crate::core::{
    bounds::Bounds,
    config::{CanvasLayerOptions, ContainerPanel, MapOptions, TileLayerOptions},
    events::{LayerEvent, TileInfo},
    geo::{Point, Size, TileCoord, TileId},
    gesture::GestureState,
    viewport::{MapView, Viewport, ZoomParam},
};

pub use crate::layers::{
    base::{CanvasLayerHost, ClipMask, LayerHost, TileLayerHost},
    canvas::{CanvasPainter, CanvasRenderer},
    tile::{
        loader::{ImageLoader, LoadError, LoadRequest, LoadTask},
        source::TileSource,
        TileGrid, TileLayerRenderer,
    },
};

pub use crate::rendering::{
    context::RenderContext,
    resources::{ImageHandle, ResourceCache, ResourceKey},
    scheduler::{Deferred, FrameSlot},
};

pub use crate::runtime::{runtime, spawn, AsyncHandle, AsyncSpawner};

pub use crate::traits::LayerRenderer;

pub use crate::{Error as MapError, Result};

pub use std::{pin::Pin, rc::Rc, sync::Arc, time::Duration};

pub use instant::Instant;

pub use fxhash::{FxHashMap as HashMap, FxHashSet as HashSet};

pub use futures::Future;
