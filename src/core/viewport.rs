//! The host viewport as seen by layer renderers.
//!
//! Renderers never own the map; they query it through [`MapView`] for the
//! current zoom, extent, pitch and gesture phase, and ask it for a global
//! redraw. [`Viewport`] is a plain, scriptable implementation used by
//! headless hosts and tests.

use crate::core::{
    bounds::Bounds,
    config::MapOptions,
    geo::{Point, Size},
    transform::Affine2,
};
use crate::prelude::Duration;
use nalgebra::Matrix4;
use serde::{Deserialize, Serialize};
use std::cell::{Cell, RefCell};

/// Matrices describing one frame of a zoom animation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoomMatrices {
    /// Transform to apply to a frozen full-viewport raster
    pub container: Affine2,
    /// Transform to apply to a level container in view space
    pub view: Affine2,
}

/// Parameter emitted by the map for every intermediate zoom frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoomParam {
    pub from: f64,
    pub to: f64,
    /// Zoom origin in container pixels
    pub origin: Point,
    pub matrix: ZoomMatrices,
}

impl ZoomParam {
    /// Build the parameter for a zoom frame at fractional progress `zoom`
    pub fn at(from: f64, to: f64, zoom: f64, origin: Point) -> Self {
        let scale = 2_f64.powf(zoom - from);
        let about_origin = Affine2([
            scale,
            0.0,
            0.0,
            scale,
            origin.x * (1.0 - scale),
            origin.y * (1.0 - scale),
        ]);
        Self {
            from,
            to,
            origin,
            matrix: ZoomMatrices {
                container: about_origin,
                view: about_origin,
            },
        }
    }
}

/// Narrow interface onto the host map
pub trait MapView {
    fn zoom(&self) -> f64;

    /// Viewport size in CSS pixels
    fn size(&self) -> Size;

    /// Map center in 2D point coordinates at `zoom` (current zoom if `None`)
    fn center_point(&self, zoom: Option<f64>) -> Point;

    fn resolution(&self, zoom: f64) -> f64 {
        2_f64.powf(-zoom)
    }

    /// Visible extent in 2D point coordinates at the current zoom
    fn extent_2d(&self) -> Bounds {
        let size = self.size();
        let center = self.center_point(None);
        let min = Point::new(center.x - size.width / 2.0, center.y - size.height / 2.0);
        Bounds::from_origin_and_size(min, size)
    }

    fn container_point_to_point(&self, point: Point) -> Point {
        self.extent_2d().min.add(&point)
    }

    fn point_to_container_point(&self, point: Point) -> Point {
        point.subtract(&self.extent_2d().min)
    }

    /// Current offset of the map's platform panel
    fn view_point(&self) -> Point;

    /// Platform offset captured at gesture start
    fn offset_platform(&self) -> Point;

    /// Pitch in degrees
    fn pitch(&self) -> f64;

    /// Perspective matrix when the map is pitched or rotated
    fn dom_css_matrix(&self) -> Option<Matrix4<f64>>;

    fn is_zooming(&self) -> bool;
    fn is_moving(&self) -> bool;
    fn is_drag_rotating(&self) -> bool;

    fn is_interacting(&self) -> bool {
        self.is_zooming() || self.is_moving() || self.is_drag_rotating()
    }

    fn is_transforming(&self) -> bool {
        self.dom_css_matrix().is_some()
    }

    /// Duration of the running map animation, if any
    fn animation_duration(&self) -> Option<Duration>;

    fn is_state_changed(&self) -> bool {
        false
    }

    /// Whether the rendering backend can transform containers live
    fn supports_3d_transform(&self) -> bool {
        true
    }

    fn device_pixel_ratio(&self) -> f64 {
        1.0
    }

    fn options(&self) -> MapOptions;

    fn is_base_layer(&self, layer_id: &str) -> bool;

    /// Ask the host for a global redraw
    fn request_render(&self);
}

/// Scriptable single-threaded viewport
#[derive(Debug)]
pub struct Viewport {
    zoom: Cell<f64>,
    size: Cell<Size>,
    center: Cell<Point>,
    pitch: Cell<f64>,
    dom_matrix: Cell<Option<Matrix4<f64>>>,
    view_point: Cell<Point>,
    platform_offset: Cell<Point>,
    zooming: Cell<bool>,
    moving: Cell<bool>,
    drag_rotating: Cell<bool>,
    animation: Cell<Option<Duration>>,
    state_changed: Cell<bool>,
    supports_3d: Cell<bool>,
    pixel_ratio: Cell<f64>,
    options: RefCell<MapOptions>,
    base_layer: RefCell<Option<String>>,
    render_requests: Cell<usize>,
}

impl Viewport {
    /// Creates a viewport centered on `center` (2D point at `zoom`)
    pub fn new(center: Point, zoom: f64, size: Size) -> Self {
        Self {
            zoom: Cell::new(zoom),
            size: Cell::new(size),
            center: Cell::new(center),
            pitch: Cell::new(0.0),
            dom_matrix: Cell::new(None),
            view_point: Cell::new(Point::zero()),
            platform_offset: Cell::new(Point::zero()),
            zooming: Cell::new(false),
            moving: Cell::new(false),
            drag_rotating: Cell::new(false),
            animation: Cell::new(None),
            state_changed: Cell::new(false),
            supports_3d: Cell::new(true),
            pixel_ratio: Cell::new(1.0),
            options: RefCell::new(MapOptions::default()),
            base_layer: RefCell::new(None),
            render_requests: Cell::new(0),
        }
    }

    /// Sets the zoom, keeping the same geographic center
    pub fn set_zoom(&self, zoom: f64) {
        let scale = 2_f64.powf(zoom - self.zoom.get());
        self.center.set(self.center.get().multiply(scale));
        self.zoom.set(zoom);
    }

    pub fn set_center(&self, center: Point) {
        self.center.set(center);
    }

    pub fn set_size(&self, size: Size) {
        self.size.set(size);
    }

    pub fn set_pitch(&self, pitch: f64) {
        self.pitch.set(pitch);
    }

    pub fn set_dom_css_matrix(&self, matrix: Option<Matrix4<f64>>) {
        self.dom_matrix.set(matrix);
    }

    pub fn set_view_point(&self, point: Point) {
        self.view_point.set(point);
    }

    pub fn set_platform_offset(&self, offset: Point) {
        self.platform_offset.set(offset);
    }

    pub fn set_zooming(&self, zooming: bool) {
        self.zooming.set(zooming);
    }

    pub fn set_moving(&self, moving: bool) {
        self.moving.set(moving);
    }

    pub fn set_drag_rotating(&self, rotating: bool) {
        self.drag_rotating.set(rotating);
    }

    pub fn set_animation_duration(&self, duration: Option<Duration>) {
        self.animation.set(duration);
    }

    pub fn set_state_changed(&self, changed: bool) {
        self.state_changed.set(changed);
    }

    pub fn set_supports_3d_transform(&self, supported: bool) {
        self.supports_3d.set(supported);
    }

    pub fn set_device_pixel_ratio(&self, ratio: f64) {
        self.pixel_ratio.set(ratio);
    }

    pub fn set_options(&self, options: MapOptions) {
        *self.options.borrow_mut() = options;
    }

    pub fn set_base_layer(&self, layer_id: Option<&str>) {
        *self.base_layer.borrow_mut() = layer_id.map(str::to_string);
    }

    /// Number of global redraws requested so far
    pub fn render_requests(&self) -> usize {
        self.render_requests.get()
    }
}

impl MapView for Viewport {
    fn zoom(&self) -> f64 {
        self.zoom.get()
    }

    fn size(&self) -> Size {
        self.size.get()
    }

    fn center_point(&self, zoom: Option<f64>) -> Point {
        let center = self.center.get();
        match zoom {
            Some(z) => center.multiply(2_f64.powf(z - self.zoom.get())),
            None => center,
        }
    }

    fn view_point(&self) -> Point {
        self.view_point.get()
    }

    fn offset_platform(&self) -> Point {
        self.platform_offset.get()
    }

    fn pitch(&self) -> f64 {
        self.pitch.get()
    }

    fn dom_css_matrix(&self) -> Option<Matrix4<f64>> {
        self.dom_matrix.get()
    }

    fn is_zooming(&self) -> bool {
        self.zooming.get()
    }

    fn is_moving(&self) -> bool {
        self.moving.get()
    }

    fn is_drag_rotating(&self) -> bool {
        self.drag_rotating.get()
    }

    fn animation_duration(&self) -> Option<Duration> {
        self.animation.get()
    }

    fn is_state_changed(&self) -> bool {
        self.state_changed.get()
    }

    fn supports_3d_transform(&self) -> bool {
        self.supports_3d.get()
    }

    fn device_pixel_ratio(&self) -> f64 {
        self.pixel_ratio.get()
    }

    fn options(&self) -> MapOptions {
        self.options.borrow().clone()
    }

    fn is_base_layer(&self, layer_id: &str) -> bool {
        self.base_layer.borrow().as_deref() == Some(layer_id)
    }

    fn request_render(&self) {
        self.render_requests.set(self.render_requests.get() + 1);
    }
}
