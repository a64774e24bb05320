//! Core data types for the tile lifecycle

use crate::{
    core::{
        bounds::Bounds,
        config::ContainerPanel,
        events::TileInfo,
        geo::{Point, Size, TileCoord, TileId},
        transform::Affine2,
    },
    layers::tile::loader::{LoadError, LoadTask},
    prelude::{HashMap, Instant},
    rendering::resources::ImageHandle,
};
use nalgebra::Matrix4;

/// One tile the layer wants on screen, as reported by the layer
#[derive(Debug, Clone, PartialEq)]
pub struct GridTile {
    pub coord: TileCoord,
    pub id: TileId,
    pub url: String,
    /// Top-left corner relative to the grid's anchor
    pub view_point: Point,
}

impl GridTile {
    pub fn new(coord: TileCoord, url: impl Into<String>, view_point: Point) -> Self {
        Self {
            id: coord.id(),
            coord,
            url: url.into(),
            view_point,
        }
    }
}

/// The set of tiles needed for the current view
#[derive(Debug, Clone, PartialEq)]
pub struct TileGrid {
    pub tiles: Vec<GridTile>,
    pub zoom: u8,
    /// Tile extent in 2D point coordinates at `zoom`
    pub extent: Bounds,
    /// Container position of the grid origin; tile view points are
    /// measured from it
    pub anchor: Point,
}

/// Whether the latest recompute still needs the tile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retention {
    Current,
    Stale,
}

#[derive(Debug)]
pub enum TilePhase {
    /// Image request in flight
    Loading(LoadTask),
    /// Image settled (successfully or not) and fading in
    Loaded {
        at: Instant,
        error: Option<LoadError>,
    },
    /// Fully faded in
    Active { at: Instant },
    /// Request released before it settled
    Aborted,
}

impl TilePhase {
    pub fn is_loading(&self) -> bool {
        matches!(self, TilePhase::Loading(_))
    }

    pub fn loaded_at(&self) -> Option<Instant> {
        match self {
            TilePhase::Loaded { at, .. } | TilePhase::Active { at } => Some(*at),
            _ => None,
        }
    }
}

/// The image element that shows a tile
#[derive(Debug, Clone)]
pub struct TileImage {
    pub src: String,
    pub position: Point,
    pub size: Size,
    pub opacity: f32,
    pub visible: bool,
    pub cross_origin: Option<String>,
    pub css_filter: Option<String>,
    /// Decoded pixels once the current `src` has loaded
    pub image: Option<ImageHandle>,
}

#[derive(Debug)]
pub struct Tile {
    pub coord: TileCoord,
    pub id: TileId,
    pub url: String,
    pub view_point: Point,
    pub size: Size,
    pub retention: Retention,
    pub phase: TilePhase,
    /// `None` once the element was detached
    pub element: Option<TileImage>,
    /// Request for the error placeholder after a failed load
    pub(crate) fallback: Option<LoadTask>,
}

impl Tile {
    pub fn zoom(&self) -> u8 {
        self.coord.z
    }

    pub fn is_current(&self) -> bool {
        self.retention == Retention::Current
    }

    pub fn is_active(&self) -> bool {
        matches!(self.phase, TilePhase::Active { .. })
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self.phase, TilePhase::Aborted)
    }

    pub fn info(&self) -> TileInfo {
        TileInfo {
            id: self.id.clone(),
            url: self.url.clone(),
            zoom: self.coord.z,
        }
    }
}

/// Transform of a level container
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ContainerTransform {
    Affine(Affine2),
    /// `translate(translate) matrix3d(matrix)` for pitched or rotated maps
    Perspective { translate: Point, matrix: Matrix4<f64> },
}

/// All tiles of one zoom level, transformed as a unit
#[derive(Debug, Clone, PartialEq)]
pub struct LevelContainer {
    pub zoom: u8,
    pub transform: Option<ContainerTransform>,
    /// Transform of the inner element holding the tile images
    pub tile_transform: Option<Affine2>,
    /// Pinned position, kept while the platform offset resets after a zoom
    pub position: Option<Point>,
    pub size: Option<Size>,
    pub visible: bool,
    /// Tile ids in insertion order
    pub tiles: Vec<TileId>,
}

impl LevelContainer {
    pub fn new(zoom: u8) -> Self {
        Self {
            zoom,
            transform: None,
            tile_transform: None,
            position: None,
            size: None,
            visible: true,
            tiles: Vec::new(),
        }
    }
}

/// Root container of a tile layer
#[derive(Debug, Clone, PartialEq)]
pub struct LayerContainer {
    pub panel: ContainerPanel,
    pub z_index: Option<i32>,
    pub visible: bool,
    pub levels: HashMap<u8, LevelContainer>,
}

impl LayerContainer {
    pub fn new(panel: ContainerPanel, z_index: Option<i32>) -> Self {
        Self {
            panel,
            z_index,
            visible: true,
            levels: HashMap::default(),
        }
    }

    /// Levels from lowest to highest zoom
    pub fn levels_sorted(&self) -> Vec<&LevelContainer> {
        let mut levels: Vec<_> = self.levels.values().collect();
        levels.sort_by_key(|level| level.zoom);
        levels
    }
}
