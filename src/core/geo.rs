use serde::{Deserialize, Serialize};

/// Represents a point in screen, container or projected pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn zero() -> Self {
        Self::new(0.0, 0.0)
    }

    pub fn add(&self, other: &Point) -> Point {
        Point::new(self.x + other.x, self.y + other.y)
    }

    pub fn subtract(&self, other: &Point) -> Point {
        Point::new(self.x - other.x, self.y - other.y)
    }

    pub fn multiply(&self, scalar: f64) -> Point {
        Point::new(self.x * scalar, self.y * scalar)
    }

    pub fn round(&self) -> Point {
        Point::new(self.x.round(), self.y.round())
    }

    pub fn floor(&self) -> Point {
        Point::new(self.x.floor(), self.y.floor())
    }

    pub fn is_zero(&self) -> bool {
        self.x == 0.0 && self.y == 0.0
    }
}

impl Default for Point {
    fn default() -> Self {
        Self::zero()
    }
}

/// Pixel dimensions of a viewport, surface or tile
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

/// Tile coordinate in a pyramidal grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileCoord {
    pub x: i64,
    pub y: i64,
    pub z: u8,
}

impl TileCoord {
    pub fn new(x: i64, y: i64, z: u8) -> Self {
        Self { x, y, z }
    }

    /// Stable identifier, unique per coordinate and zoom
    pub fn id(&self) -> TileId {
        TileId(format!("{}_{}_{}", self.x, self.y, self.z))
    }
}

/// Stable tile identity derived from the tile coordinate and zoom
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileId(pub String);

impl std::fmt::Display for TileId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TileId {
    fn from(value: &str) -> Self {
        TileId(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_math() {
        let a = Point::new(3.4, -1.6);
        let b = Point::new(1.0, 1.0);
        assert_eq!(a.subtract(&b), Point::new(2.4, -2.6));
        assert_eq!(a.round(), Point::new(3.0, -2.0));
        assert!(a.subtract(&a).is_zero());
    }

    #[test]
    fn test_tile_id_is_stable() {
        let coord = TileCoord::new(3, 5, 7);
        assert_eq!(coord.id(), TileCoord::new(3, 5, 7).id());
        assert_ne!(coord.id(), TileCoord::new(3, 5, 8).id());
        assert_eq!(coord.id().to_string(), "3_5_7");
    }
}
