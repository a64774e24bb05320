//! Tile url templates and a grid builder for layers that use them

use super::types::{GridTile, TileGrid};
use crate::core::{
    bounds::Bounds,
    geo::{Point, Size, TileCoord},
    viewport::MapView,
};

/// Trait for tile url providers
pub trait TileSource {
    fn url(&self, coord: TileCoord) -> String;
}

/// `{z}/{x}/{y}` url template with optional `{s}` subdomains
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlTemplateSource {
    pub template: String,
    pub subdomains: Vec<String>,
}

impl UrlTemplateSource {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            subdomains: Vec::new(),
        }
    }

    pub fn with_subdomains(mut self, subdomains: &[&str]) -> Self {
        self.subdomains = subdomains.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn openstreetmap() -> Self {
        Self::new("https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png").with_subdomains(&["a", "b", "c"])
    }
}

impl TileSource for UrlTemplateSource {
    fn url(&self, coord: TileCoord) -> String {
        let mut url = self
            .template
            .replace("{z}", &coord.z.to_string())
            .replace("{x}", &coord.x.to_string())
            .replace("{y}", &coord.y.to_string());
        if !self.subdomains.is_empty() {
            let index = (coord.x + coord.y).unsigned_abs() as usize % self.subdomains.len();
            url = url.replace("{s}", &self.subdomains[index]);
        }
        url
    }
}

/// Tiles covering the map view at tile zoom `zoom`.
///
/// The anchor is the container position of the tile-zoom world origin, with
/// the view center kept at the center of the container.
pub fn grid_for_view(map: &dyn MapView, source: &dyn TileSource, zoom: u8, tile_size: Size) -> TileGrid {
    let size = map.size();
    let fraction = map.resolution(zoom as f64) / map.resolution(map.zoom());
    let center = map.center_point(Some(zoom as f64));
    let half = Point::new(size.width / fraction / 2.0, size.height / fraction / 2.0);
    let extent = Bounds::new(center.subtract(&half), center.add(&half));
    let anchor = Point::new(size.width / 2.0, size.height / 2.0)
        .subtract(&center)
        .round();

    if tile_size.is_empty() {
        return TileGrid {
            tiles: Vec::new(),
            zoom,
            extent,
            anchor,
        };
    }

    let world_tiles = 1_i64 << zoom.min(62);
    let min_x = (extent.min.x / tile_size.width).floor() as i64;
    let max_x = ((extent.max.x / tile_size.width).ceil() as i64).max(min_x + 1);
    let min_y = ((extent.min.y / tile_size.height).floor() as i64).max(0);
    let max_y = ((extent.max.y / tile_size.height).ceil() as i64).min(world_tiles);

    let mut tiles = Vec::new();
    for y in min_y..max_y {
        for x in min_x..max_x {
            let origin = Point::new(x as f64 * tile_size.width, y as f64 * tile_size.height);
            let wrapped = TileCoord::new(x.rem_euclid(world_tiles), y, zoom);
            tiles.push(GridTile::new(
                TileCoord::new(x, y, zoom),
                source.url(wrapped),
                origin.add(&anchor),
            ));
        }
    }

    TileGrid {
        tiles,
        zoom,
        extent,
        anchor,
    }
}
