//! LayerRenderer implementation for TileLayerRenderer

use super::TileLayerRenderer;
use crate::{
    core::viewport::ZoomParam,
    prelude::Instant,
    traits::LayerRenderer,
};

impl LayerRenderer for TileLayerRenderer {
    fn render(&mut self) {
        self.render_tiles();
    }

    fn tick(&mut self, now: Instant) {
        self.tick_tiles(now);
    }

    fn show(&mut self) {
        if self.container.is_some() {
            self.render_tiles();
            if let Some(container) = self.container.as_mut() {
                container.visible = true;
            }
        }
    }

    fn hide(&mut self) {
        if let Some(container) = self.container.as_mut() {
            container.visible = false;
            self.clear();
        }
    }

    fn remove(&mut self) {
        self.abort_loading(true);
        self.fade_frame.cancel();
        self.prune_timer.cancel();
        for tile in self.tiles.values() {
            if let super::types::TilePhase::Loading(task) = &tile.phase {
                task.cancel();
            }
        }
        self.tiles.clear();
        self.container = None;
        self.layer = None;
    }

    fn clear(&mut self) {
        self.remove_all_tiles();
        if let Some(container) = self.container.as_mut() {
            container.levels.clear();
        }
    }

    fn set_z_index(&mut self, z_index: i32) {
        self.z_index = Some(z_index);
        if let Some(container) = self.container.as_mut() {
            container.z_index = Some(z_index);
        }
    }

    fn on_zoom_start(&mut self, to: f64) {
        self.on_zoom_start_tiles(to);
    }

    fn on_zooming(&mut self, param: &ZoomParam) {
        self.on_zooming_tiles(param);
    }

    fn on_zoom_end(&mut self) {
        self.on_zoom_end_tiles();
    }

    fn on_drag_rotate_start(&mut self) {
        self.on_drag_rotate_start_tiles();
    }

    fn on_drag_rotate_end(&mut self) {
        self.render_tiles();
    }

    fn draw_on_interacting(&mut self) {
        self.draw_on_interacting_tiles();
    }

    fn needs_redraw(&self) -> bool {
        if self.redraw {
            return true;
        }
        self.map()
            .is_some_and(|map| map.is_interacting() || map.is_state_changed())
    }

    fn set_to_redraw(&mut self) {
        self.redraw = true;
    }
}
