//! Shared trait implemented by every layer renderer
//!
//! The host map calls the `on_*` handlers as gesture events arrive and
//! `tick` once per display refresh. Renderers never block: loads, fades,
//! debounced draws and deferred prunes all advance inside `tick`.

use crate::core::{geo::Point, viewport::ZoomParam};
use crate::prelude::Instant;

pub trait LayerRenderer {
    /// Bring the layer up to date with the current view
    fn render(&mut self);

    /// Advance scheduled work: frame callbacks, settled loads and timers
    fn tick(&mut self, now: Instant);

    fn show(&mut self);

    fn hide(&mut self);

    /// Detach from the layer. Cancels every pending frame, timer and load.
    fn remove(&mut self);

    fn clear(&mut self);

    fn set_z_index(&mut self, z_index: i32);

    fn on_zoom_start(&mut self, _to: f64) {}

    fn on_zooming(&mut self, _param: &ZoomParam) {}

    fn on_zoom_end(&mut self) {}

    fn on_move_start(&mut self) {}

    fn on_moving(&mut self) {}

    fn on_move_end(&mut self) {}

    fn on_resize(&mut self) {}

    fn on_drag_rotate_start(&mut self) {}

    fn on_drag_rotate_end(&mut self) {}

    /// Redraw while the map is zooming, moving or rotating
    fn draw_on_interacting(&mut self) {}

    fn needs_redraw(&self) -> bool;

    fn set_to_redraw(&mut self);

    /// Whether the layer has painted anything at a point in 2D point
    /// coordinates
    fn hit_detect(&mut self, _point: Point) -> bool {
        false
    }
}
