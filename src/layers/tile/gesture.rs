//! Gesture handling: zoom, pan and rotate only transform level containers,
//! tiles are not reloaded mid-gesture

use super::layer::TileLayerRenderer;
use super::types::ContainerTransform;
use crate::core::{
    geo::{Point, Size},
    transform::{fractional_perspective, Affine2},
    viewport::ZoomParam,
};

impl TileLayerRenderer {
    pub(crate) fn on_zoom_start_tiles(&mut self, to: f64) {
        let Some(map) = self.map() else {
            return;
        };
        self.fade_animated = false;
        self.gesture
            .begin_zoom(map.zoom(), to, Some(map.offset_platform().round()));
        if !map.supports_3d_transform() {
            if let Some(container) = self.container.as_mut() {
                container.visible = false;
            }
        }
        self.prune_tiles(true);
        self.update_tile_size();
    }

    pub(crate) fn on_zooming_tiles(&mut self, param: &ZoomParam) {
        self.gesture.record(*param);
    }

    pub(crate) fn on_zoom_end_tiles(&mut self) {
        let Some(map) = self.map() else {
            return;
        };
        if self.container.is_none() {
            return;
        }
        let transition = self.gesture.end();
        let animated = transition.as_ref().is_some_and(|t| t.has_animated());
        if !animated {
            // nothing was transformed, drop the level instead of settling it
            if let Some(zoom) = self.tile_zoom {
                self.remove_tile_container(zoom);
            }
        }
        self.preloaded = false;
        self.prune_timer.cancel();

        let supports_3d = map.supports_3d_transform();
        let platform_offset = transition.and_then(|t| t.platform_offset);
        if let Some(container) = self.container.as_mut() {
            if let Some(level) = self.tile_zoom.and_then(|z| container.levels.get_mut(&z)) {
                if supports_3d {
                    // the platform offset resets to zero after the zoom,
                    // pin the old level where it was
                    if let Some(offset) = platform_offset {
                        level.position = Some(offset);
                    }
                } else {
                    level.visible = false;
                    container.visible = true;
                }
            }
        }
        self.fade_animated = self
            .layer
            .as_ref()
            .is_some_and(|layer| layer.tile_options().fade_animation);
        self.redraw = true;
    }

    /// Draw while the map is interacting
    pub(crate) fn draw_on_interacting_tiles(&mut self) {
        let (Some(map), Some(layer)) = (self.map(), self.layer.clone()) else {
            return;
        };
        let options = layer.tile_options();
        let long_animation = map
            .animation_duration()
            .is_some_and(|duration| duration >= options.duration_to_animate());

        if long_animation {
            self.fade_animated = false;
            let pre_tile_zoom = self.tile_zoom;
            let center_left_extent = match (pre_tile_zoom, self.tile_extent) {
                (Some(z), Some(extent)) => !extent.contains(&map.center_point(Some(z as f64))),
                _ => true,
            };
            if pre_tile_zoom != Some(layer.tile_zoom()) || center_left_extent {
                self.abort_loading(false);
                self.render_tiles();
            } else {
                self.update_container();
            }

            if map.is_zooming() && (!self.preloaded || pre_tile_zoom != self.tile_zoom) {
                let end_zoom = self.gesture.transition().map(|t| t.end_zoom);
                if let (Some(pre), Some(current), Some(end)) = (pre_tile_zoom, self.tile_zoom, end_zoom) {
                    let step = (end - pre as f64).signum() as i16;
                    let next = current as i16 + if end == pre as f64 { 0 } else { step };
                    if next != current as i16 && (0..=u8::MAX as i16).contains(&next) {
                        if let Some(grid) = layer.tile_grid(Some(next as u8)) {
                            self.preload_tiles(&grid.tiles);
                        }
                    }
                }
            }
            return;
        }

        if map.is_zooming() {
            self.draw_on_zooming();
        } else if map.is_drag_rotating() {
            self.draw_on_drag_rotating();
        } else if map.is_moving() {
            self.draw_on_moving();
        }
    }

    fn draw_on_zooming(&mut self) {
        let Some(map) = self.map() else {
            return;
        };
        let Some(param) = self.gesture.take_pending() else {
            return;
        };
        let Some(zoom) = self.tile_zoom else {
            return;
        };
        if self.level(zoom).is_none() {
            return;
        }
        if map.dom_css_matrix().is_some() {
            self.update_container();
        } else if let Some(level) = self.level_container(zoom) {
            level.transform = Some(ContainerTransform::Affine(param.matrix.view));
        }
    }

    fn draw_on_moving(&mut self) {
        let Some(map) = self.map() else {
            return;
        };
        let render_on_moving = self
            .layer
            .as_ref()
            .is_some_and(|layer| layer.tile_options().render_on_moving);
        if map.pitch() == 0.0 && !render_on_moving {
            return;
        }
        self.render_tiles();
    }

    fn draw_on_drag_rotating(&mut self) {
        let Some(map) = self.map() else {
            return;
        };
        let render_on_rotating = self
            .layer
            .as_ref()
            .is_some_and(|layer| layer.tile_options().render_on_rotating);
        if map.dom_css_matrix().is_none() || render_on_rotating {
            self.render_tiles();
        } else {
            self.update_container();
        }
    }

    /// Place the current level container for the map's zoom, pitch and
    /// bearing. Integer and fractional zooms without a perspective matrix
    /// use a 2D translate and scale; otherwise a full 3D matrix is composed.
    pub(crate) fn update_container(&mut self) {
        let Some(map) = self.map() else {
            return;
        };
        let Some(tile_zoom) = self.tile_zoom else {
            return;
        };
        let size = map.size();
        let fraction = map.resolution(tile_zoom as f64) / map.resolution(map.zoom());
        let center_offset = self.center_offset;
        let dom_matrix = map.dom_css_matrix();
        let zoom_origin = if map.is_zooming() {
            self.gesture
                .transition()
                .and_then(|t| t.last_param())
                .map(|param| param.origin)
        } else {
            None
        };
        let start_zoom = self.gesture.transition().map(|t| t.start_zoom);

        let Some(level) = self.level_container(tile_zoom) else {
            return;
        };
        level.position = None;

        let Some(dom_matrix) = dom_matrix else {
            let mut transform = Affine2::identity();
            if fraction != 1.0 {
                transform = Affine2::scale_about_center(fraction, size);
            }
            if let Some(offset) = center_offset.filter(|o| !o.is_zero()) {
                transform = transform.then(&Affine2::translate(offset.multiply(fraction)));
            }
            level.transform = None;
            level.size = None;
            level.tile_transform = (!transform.is_identity()).then_some(transform);
            return;
        };

        level.size = Some(Size::new(size.width, size.height));
        let matrix = fractional_perspective(&dom_matrix, fraction, zoom_origin, size, map.pitch());
        let map_offset = map.view_point().round();
        let mut tile_offset = if map.is_zooming() {
            // the map offset is frozen at zoom start
            let start_fraction = start_zoom
                .map(|start| map.resolution(tile_zoom as f64) / map.resolution(start))
                .unwrap_or(fraction);
            map_offset.multiply(1.0 / start_fraction)
        } else {
            map_offset.multiply(1.0 / fraction)
        };
        if let Some(offset) = center_offset {
            tile_offset = tile_offset.add(&offset);
        }
        level.tile_transform = Some(Affine2::translate(tile_offset));
        level.transform = Some(ContainerTransform::Perspective {
            translate: map_offset.multiply(-1.0),
            matrix,
        });
    }

    pub(crate) fn on_drag_rotate_start_tiles(&mut self) {
        self.prune_tiles(true);
    }

    /// Container point of a tile's top-left corner under the level's 2D
    /// transform
    pub fn tile_container_point(&self, id: &crate::core::geo::TileId) -> Option<Point> {
        let tile = self.tiles.get(id)?;
        let level = self.level(tile.zoom())?;
        let mut point = tile.element.as_ref()?.position;
        if let Some(transform) = level.tile_transform {
            point = transform.apply(point);
        }
        if let Some(ContainerTransform::Affine(transform)) = level.transform {
            point = transform.apply(point);
        }
        if let Some(position) = level.position {
            point = point.add(&position);
        }
        Some(point)
    }
}
