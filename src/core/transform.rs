//! 2D affine and 3D perspective transforms applied to containers and rasters.

use crate::core::geo::{Point, Size};
use nalgebra::{Matrix4, Vector3};
use serde::{Deserialize, Serialize};

/// CSS-style 2D affine matrix `[a, b, c, d, e, f]`, i.e.
/// `x' = a*x + c*y + e`, `y' = b*x + d*y + f`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Affine2(pub [f64; 6]);

impl Affine2 {
    pub fn identity() -> Self {
        Affine2([1.0, 0.0, 0.0, 1.0, 0.0, 0.0])
    }

    pub fn translate(offset: Point) -> Self {
        Affine2([1.0, 0.0, 0.0, 1.0, offset.x, offset.y])
    }

    /// Uniform scale that keeps the center of `size` fixed
    pub fn scale_about_center(scale: f64, size: Size) -> Self {
        Affine2([
            scale,
            0.0,
            0.0,
            scale,
            size.width / 2.0 * (1.0 - scale),
            size.height / 2.0 * (1.0 - scale),
        ])
    }

    /// Matrix equivalent to applying `self` first, then `next`
    pub fn then(&self, next: &Affine2) -> Affine2 {
        let [a1, b1, c1, d1, e1, f1] = self.0;
        let [a2, b2, c2, d2, e2, f2] = next.0;
        Affine2([
            a2 * a1 + c2 * b1,
            b2 * a1 + d2 * b1,
            a2 * c1 + c2 * d1,
            b2 * c1 + d2 * d1,
            a2 * e1 + c2 * f1 + e2,
            b2 * e1 + d2 * f1 + f2,
        ])
    }

    pub fn apply(&self, point: Point) -> Point {
        let [a, b, c, d, e, f] = self.0;
        Point::new(a * point.x + c * point.y + e, b * point.x + d * point.y + f)
    }

    pub fn scale(&self) -> f64 {
        self.0[0]
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::identity()
    }
}

impl Default for Affine2 {
    fn default() -> Self {
        Self::identity()
    }
}

/// Compose the perspective matrix of a level container at a fractional zoom.
///
/// `dom_matrix` is the map's pitch/bearing matrix. When the map is zooming
/// around an off-center `origin`, the scaled layer is shifted so it keeps
/// tracking the map's own scaling; the pitch factor compensates for tilt.
pub fn fractional_perspective(
    dom_matrix: &Matrix4<f64>,
    fraction: f64,
    zoom_origin: Option<Point>,
    size: Size,
    pitch_degrees: f64,
) -> Matrix4<f64> {
    if fraction == 1.0 {
        return *dom_matrix;
    }
    let mut m = Matrix4::identity();
    if let Some(origin) = zoom_origin {
        let tilt = if pitch_degrees != 0.0 {
            pitch_degrees.to_radians().cos()
        } else {
            1.0
        };
        let offset = Vector3::new(
            (origin.x - size.width / 2.0) * (1.0 - fraction),
            (origin.y - size.height / 2.0) * (1.0 - fraction) * tilt,
            0.0,
        );
        m = m * Matrix4::new_translation(&offset);
    }
    m = m * dom_matrix;
    m * Matrix4::new_nonuniform_scaling(&Vector3::new(fraction, fraction, 1.0))
}
