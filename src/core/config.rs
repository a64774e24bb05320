//! Configuration for layer renderers and the host map
//!
//! Every option struct deserializes from JSON with per-field defaults, so a
//! layer can hand over a partial option object and get sensible behavior.

use crate::core::constants::{
    DEFAULT_DURATION_TO_ANIMATE_MS, DEFAULT_ICON_SIZE, DEFAULT_ZOOM_ANIMATION_MS,
    FADE_DURATION_MS,
};
use crate::prelude::Duration;
use crate::Result;
use serde::{Deserialize, Serialize};

/// Which map panel a tile layer container is attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ContainerPanel {
    Front,
    #[default]
    Back,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TileLayerOptions {
    pub cross_origin: Option<String>,
    /// Image shown in place of a tile that failed to load
    pub error_tile_url: Option<String>,
    pub render_on_moving: bool,
    pub render_on_rotating: bool,
    /// Map animations at least this long are drawn in interaction mode
    pub duration_to_animate_ms: u64,
    pub css_filter: Option<String>,
    pub container: ContainerPanel,
    pub fade_animation: bool,
    pub fade_duration_ms: u64,
    /// Grow tiles by one pixel while the container is transformed to hide seams
    pub seam_fix: bool,
}

impl Default for TileLayerOptions {
    fn default() -> Self {
        Self {
            cross_origin: None,
            error_tile_url: None,
            render_on_moving: false,
            render_on_rotating: false,
            duration_to_animate_ms: DEFAULT_DURATION_TO_ANIMATE_MS,
            css_filter: None,
            container: ContainerPanel::Back,
            fade_animation: true,
            fade_duration_ms: FADE_DURATION_MS,
            seam_fix: false,
        }
    }
}

impl TileLayerOptions {
    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }

    pub fn fade_duration(&self) -> Duration {
        Duration::from_millis(self.fade_duration_ms)
    }

    pub fn duration_to_animate(&self) -> Duration {
        Duration::from_millis(self.duration_to_animate_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CanvasLayerOptions {
    pub cross_origin: Option<String>,
    /// Draw synchronously instead of on the next display refresh
    pub draw_immediate: bool,
    /// Redraw live while zooming instead of transforming the last raster
    pub update_when_zooming: bool,
    /// Bake SVG resources onto a fixed-size raster after loading
    pub cache_svg_on_canvas: bool,
    pub default_icon_size: (u32, u32),
    pub global_composite_operation: Option<String>,
    /// Request SVG resources at twice their nominal size
    pub amplify_svg: bool,
}

impl Default for CanvasLayerOptions {
    fn default() -> Self {
        Self {
            cross_origin: None,
            draw_immediate: false,
            update_when_zooming: false,
            cache_svg_on_canvas: false,
            default_icon_size: DEFAULT_ICON_SIZE,
            global_composite_operation: None,
            amplify_svg: true,
        }
    }
}

impl CanvasLayerOptions {
    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapOptions {
    pub zoom_animation_duration_ms: u64,
    /// Keep the previous zoom level visible behind the base layer
    pub zoom_background: bool,
}

impl Default for MapOptions {
    fn default() -> Self {
        Self {
            zoom_animation_duration_ms: DEFAULT_ZOOM_ANIMATION_MS,
            zoom_background: false,
        }
    }
}

impl MapOptions {
    pub fn zoom_animation_duration(&self) -> Duration {
        Duration::from_millis(self.zoom_animation_duration_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_partial_tile_options_keep_defaults() {
        let options = TileLayerOptions::from_json(json!({
            "error_tile_url": "error.png",
            "container": "front"
        }))
        .unwrap();

        assert_eq!(options.error_tile_url.as_deref(), Some("error.png"));
        assert_eq!(options.container, ContainerPanel::Front);
        assert_eq!(options.fade_duration(), Duration::from_millis(200));
        assert!(options.fade_animation);
    }

    #[test]
    fn test_canvas_options_reject_wrong_types() {
        let result = CanvasLayerOptions::from_json(json!({ "draw_immediate": "yes" }));
        assert!(result.is_err());
    }

    #[test]
    fn test_map_options_defaults() {
        let options = MapOptions::default();
        assert_eq!(options.zoom_animation_duration(), Duration::from_millis(250));
        assert!(!options.zoom_background);
    }
}
