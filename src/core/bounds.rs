use crate::core::geo::{Point, Size};
use serde::{Deserialize, Serialize};

/// Represents a bounding box in 2D point coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: Point,
    pub max: Point,
}

impl Bounds {
    /// Creates new bounds from two points
    pub fn new(min: Point, max: Point) -> Self {
        Self { min, max }
    }

    /// Creates bounds from individual coordinates
    pub fn from_coords(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self::new(Point::new(min_x, min_y), Point::new(max_x, max_y))
    }

    /// Creates bounds anchored at `min` spanning `size`
    pub fn from_origin_and_size(min: Point, size: Size) -> Self {
        Self::new(min, Point::new(min.x + size.width, min.y + size.height))
    }

    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    pub fn size(&self) -> Size {
        Size::new(self.width(), self.height())
    }

    /// Checks if the bounds contain a point (edges inclusive)
    pub fn contains(&self, point: &Point) -> bool {
        point.x >= self.min.x
            && point.x <= self.max.x
            && point.y >= self.min.y
            && point.y <= self.max.y
    }

    /// Checks if the bounds intersect with another bounds
    pub fn intersects(&self, other: &Bounds) -> bool {
        !(other.max.x < self.min.x
            || other.min.x > self.max.x
            || other.max.y < self.min.y
            || other.min.y > self.max.y)
    }

    /// Gets the intersection of two bounds
    pub fn intersection(&self, other: &Bounds) -> Option<Bounds> {
        if !self.intersects(other) {
            return None;
        }

        Some(Bounds::new(
            Point::new(self.min.x.max(other.min.x), self.min.y.max(other.min.y)),
            Point::new(self.max.x.min(other.max.x), self.max.y.min(other.max.y)),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_intersection() {
        let a = Bounds::from_coords(0.0, 0.0, 10.0, 10.0);
        let b = Bounds::from_coords(5.0, 5.0, 15.0, 15.0);
        let c = Bounds::from_coords(20.0, 20.0, 30.0, 30.0);

        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));
        assert_eq!(
            a.intersection(&b),
            Some(Bounds::from_coords(5.0, 5.0, 10.0, 10.0))
        );
        assert_eq!(a.intersection(&c), None);
    }

    #[test]
    fn test_bounds_contains_edges() {
        let bounds = Bounds::from_origin_and_size(Point::new(10.0, 10.0), Size::new(5.0, 5.0));
        assert!(bounds.contains(&Point::new(10.0, 15.0)));
        assert!(!bounds.contains(&Point::new(9.9, 12.0)));
        assert_eq!(bounds.size(), Size::new(5.0, 5.0));
    }
}
