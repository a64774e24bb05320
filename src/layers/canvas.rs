//! Canvas renderer: the render loop shared by layers that paint onto a
//! raster surface.
//!
//! A render cycle runs `prepare -> (load resources) -> draw -> complete`.
//! Draws are deferred to the next display refresh unless the layer asks to
//! draw immediately, and at most one deferred draw is ever pending.

use crate::{
    core::{
        bounds::Bounds,
        events::LayerEvent,
        geo::{Point, Size},
        gesture::GestureState,
        transform::Affine2,
        viewport::{MapView, ZoomParam},
    },
    layers::{
        base::{CanvasLayerHost, ClipMask},
        tile::loader::{ImageLoader, LoadRequest, LoadTask},
    },
    prelude::{Arc, HashSet, Instant, Rc},
    rendering::{
        context::{CompositeOperation, RenderContext, SurfaceError},
        resources::{ImageHandle, ResourceCache, ResourceKey, SvgKind},
        scheduler::FrameSlot,
    },
    traits::LayerRenderer,
    Result,
};
use image::imageops;
use std::ops::{Deref, DerefMut};

/// The layer-specific half of a canvas renderer
pub trait CanvasPainter {
    /// External resources the next draw needs
    fn check_resources(&self) -> Vec<ResourceKey> {
        Vec::new()
    }

    fn draw(&mut self, ctx: &mut RenderContext, resources: &ResourceCache, map: &dyn MapView) -> Result<()>;

    /// Live redraw for one zoom frame
    fn draw_on_zooming(
        &mut self,
        ctx: &mut RenderContext,
        resources: &ResourceCache,
        map: &dyn MapView,
        _param: &ZoomParam,
    ) -> Result<()> {
        self.draw(ctx, resources, map)
    }

    /// Whether the last draw left the surface empty
    fn is_blank(&self) -> bool {
        false
    }

    fn on_canvas_create(&mut self, _ctx: &mut RenderContext) {}

    fn on_remove(&mut self) {}
}

/// Fetches of one `load_resources` call. Failed or aborted resources still
/// settle; they are marked as errors in the cache.
#[derive(Debug, Default)]
pub struct ResourceBatch {
    pending: Vec<(ResourceKey, LoadTask)>,
    settled: Vec<ResourceKey>,
}

impl ResourceBatch {
    /// Number of fetches issued and not yet settled
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn is_settled(&self) -> bool {
        self.pending.is_empty()
    }

    /// Keys settled so far, successful or not
    pub fn settled(&self) -> &[ResourceKey] {
        &self.settled
    }

    fn cancel(&self) {
        for (_, task) in &self.pending {
            task.cancel();
        }
    }
}

/// The raster of the last paint, as handed to the map compositor
#[derive(Debug)]
pub struct CanvasImage<'a> {
    pub image: &'a tiny_skia::Pixmap,
    /// Container point of the raster's top-left corner
    pub point: Point,
    pub size: Size,
    /// Zoom transform to apply while the raster is frozen
    pub transform: Option<Affine2>,
}

/// Restores the clip of a surface when the draw that set it up ends,
/// however it ends
struct ClipScope<'a> {
    ctx: &'a mut RenderContext,
    clipped: bool,
}

impl<'a> ClipScope<'a> {
    fn enter(ctx: &'a mut RenderContext, mask: Option<&dyn ClipMask>, extent: Option<Bounds>, map: &dyn MapView) -> Self {
        let clipped = match (mask, extent) {
            (Some(mask), Some(extent)) if mask.extent_2d().intersects(&extent) => {
                ctx.save();
                mask.paint_clip(ctx, map);
                true
            }
            _ => false,
        };
        Self { ctx, clipped }
    }
}

impl Deref for ClipScope<'_> {
    type Target = RenderContext;

    fn deref(&self) -> &RenderContext {
        self.ctx
    }
}

impl DerefMut for ClipScope<'_> {
    fn deref_mut(&mut self) -> &mut RenderContext {
        self.ctx
    }
}

impl Drop for ClipScope<'_> {
    fn drop(&mut self) {
        if self.clipped {
            self.ctx.restore();
        }
    }
}

pub struct CanvasRenderer<P: CanvasPainter> {
    layer: Option<Rc<dyn CanvasLayerHost>>,
    loader: Rc<dyn ImageLoader>,
    painter: P,
    context: Option<RenderContext>,
    resources: Option<ResourceCache>,
    batches: Vec<ResourceBatch>,
    frame: FrameSlot<()>,
    gesture: GestureState,
    render_zoom: Option<f64>,
    extent_2d: Option<Bounds>,
    north_west: Option<Point>,
    loaded: bool,
    painted: bool,
    suppress_map_render: bool,
    /// Set once pixel readback failed on a tainted surface
    hit_test_disabled: bool,
    redraw: bool,
}

impl<P: CanvasPainter> CanvasRenderer<P> {
    pub fn new(layer: Rc<dyn CanvasLayerHost>, loader: Rc<dyn ImageLoader>, painter: P) -> Self {
        Self {
            layer: Some(layer),
            loader,
            painter,
            context: None,
            resources: None,
            batches: Vec::new(),
            frame: FrameSlot::new(),
            gesture: GestureState::default(),
            render_zoom: None,
            extent_2d: None,
            north_west: None,
            loaded: false,
            painted: false,
            suppress_map_render: false,
            hit_test_disabled: false,
            redraw: false,
        }
    }

    fn map(&self) -> Option<Rc<dyn MapView>> {
        self.layer.as_ref()?.map()
    }

    fn fire(&self, event: LayerEvent) {
        if let Some(layer) = &self.layer {
            layer.fire(event);
        }
    }

    fn layer_is_empty(&self) -> bool {
        self.layer.as_ref().is_some_and(|layer| layer.is_empty())
    }

    pub fn painter(&self) -> &P {
        &self.painter
    }

    pub fn painter_mut(&mut self) -> &mut P {
        &mut self.painter
    }

    pub fn resources(&self) -> Option<&ResourceCache> {
        self.resources.as_ref()
    }

    pub fn context(&self) -> Option<&RenderContext> {
        self.context.as_ref()
    }

    pub fn extent_2d(&self) -> Option<Bounds> {
        self.extent_2d
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn is_draw_pending(&self) -> bool {
        self.frame.is_pending()
    }

    pub fn pending_resources(&self) -> usize {
        self.batches.iter().map(ResourceBatch::pending).sum()
    }

    /// Run a render cycle. With `check_resources`, missing resources are
    /// fetched first and the draw waits until they all settle.
    pub fn render(&mut self, check_resources: bool) {
        self.redraw = false;
        self.prepare_render();
        let Some(layer) = self.layer.clone() else {
            return;
        };
        if layer.map().is_none() {
            return;
        }
        if !layer.is_visible() {
            self.complete_render();
            return;
        }
        self.resources.get_or_insert_with(ResourceCache::new);
        if check_resources {
            let keys = self.painter.check_resources();
            if !keys.is_empty() {
                let batch = self.load_resources(&keys);
                if batch.is_settled() {
                    self.fire(LayerEvent::ResourceLoad);
                    self.try_to_draw();
                } else {
                    self.batches.push(batch);
                }
                return;
            }
        }
        self.try_to_draw();
    }

    /// Capture the view the next draw is for
    pub fn prepare_render(&mut self) {
        let Some(map) = self.map() else {
            return;
        };
        self.render_zoom = Some(map.zoom());
        self.extent_2d = Some(map.extent_2d());
        self.north_west = Some(map.container_point_to_point(Point::zero()));
        self.loaded = false;
    }

    /// Issue one fetch per distinct key that is not loaded yet
    pub fn load_resources(&mut self, keys: &[ResourceKey]) -> ResourceBatch {
        let mut batch = ResourceBatch::default();
        let Some(layer) = self.layer.clone() else {
            return batch;
        };
        let options = layer.canvas_options();
        let resources = self.resources.get_or_insert_with(ResourceCache::new);
        let mut seen = HashSet::default();

        for key in keys {
            if !key.is_valid() || !seen.insert(key.composite()) {
                continue;
            }
            if resources.is_resource_loaded(key, true) {
                continue;
            }
            let mut key = key.clone();
            if options.amplify_svg && key.svg_kind().is_some() {
                key.width = key.width.map(|w| w.saturating_mul(2));
                key.height = key.height.map(|h| h.saturating_mul(2));
            }
            let request = LoadRequest::new(key.url.clone())
                .with_cross_origin(options.cross_origin.clone())
                .with_size(key.width, key.height);
            let task = self.loader.load(request);
            batch.pending.push((key, task));
        }

        #[cfg(feature = "debug")]
        log::debug!("layer {}: loading {} resources", layer.id(), batch.pending.len());

        batch
    }

    /// Settle whatever finished in `batch`; true once all of it has
    pub fn poll_resources(&mut self, batch: &mut ResourceBatch) -> bool {
        let mut index = 0;
        while index < batch.pending.len() {
            let Some(result) = batch.pending[index].1.poll() else {
                index += 1;
                continue;
            };
            let (key, _) = batch.pending.swap_remove(index);
            match result {
                Ok(image) => self.cache_resource(&key, image),
                Err(err) => {
                    #[cfg(feature = "debug")]
                    if matches!(err, crate::layers::tile::loader::LoadError::Aborted) {
                        log::warn!("image loading aborted: {}", key.url);
                    } else {
                        log::warn!("image loading failed: {}: {}", key.url, err);
                    }
                    #[cfg(not(feature = "debug"))]
                    let _ = err;
                    if let Some(resources) = self.resources.as_mut() {
                        resources.mark_error_resource(&key);
                    }
                }
            }
            batch.settled.push(key);
        }
        batch.is_settled()
    }

    fn cache_resource(&mut self, key: &ResourceKey, image: ImageHandle) {
        let Some(layer) = &self.layer else {
            return;
        };
        let Some(resources) = self.resources.as_mut() else {
            return;
        };
        let options = layer.canvas_options();
        let mut image = image;
        if options.cache_svg_on_canvas && key.svg_kind() == Some(SvgKind::File) {
            let (default_w, default_h) = options.default_icon_size;
            let width = key
                .width
                .unwrap_or(if image.width() > 0 { image.width() } else { default_w });
            let height = key
                .height
                .unwrap_or(if image.height() > 0 { image.height() } else { default_h });
            if (width, height) != image.dimensions() {
                image = Arc::new(imageops::resize(
                    &*image,
                    width,
                    height,
                    imageops::FilterType::Triangle,
                ));
            }
        }
        resources.add_resource(key, image);
    }

    fn try_to_draw(&mut self) {
        self.frame.cancel();
        if self.context.is_none() && self.layer_is_empty() {
            self.complete_render();
            return;
        }
        let draw_immediate = self
            .layer
            .as_ref()
            .is_some_and(|layer| layer.canvas_options().draw_immediate);
        if draw_immediate {
            self.painted = true;
            self.draw();
        } else {
            self.frame.request(());
        }
    }

    fn create_canvas(&mut self) {
        if self.context.is_some() {
            return;
        }
        let (Some(layer), Some(map)) = (self.layer.clone(), self.map()) else {
            return;
        };
        let mut ctx = match RenderContext::new(map.size(), map.device_pixel_ratio()) {
            Ok(ctx) => ctx,
            Err(_err) => {
                #[cfg(feature = "debug")]
                log::warn!("layer {}: {}", layer.id(), _err);
                return;
            }
        };
        if let Some(op) = layer.canvas_options().global_composite_operation {
            match op.parse::<CompositeOperation>() {
                Ok(op) => ctx.set_composite_operation(op),
                Err(_err) => {
                    #[cfg(feature = "debug")]
                    log::warn!("layer {}: {}", layer.id(), _err);
                }
            }
        }
        self.painter.on_canvas_create(&mut ctx);
        self.context = Some(ctx);
    }

    /// Grow the surface to `size` (the map size when `None`)
    pub fn resize_canvas(&mut self, size: Option<Size>) {
        let Some(map) = self.map() else {
            return;
        };
        if let Some(ctx) = self.context.as_mut() {
            if let Err(_err) = ctx.resize(size.unwrap_or_else(|| map.size()), map.device_pixel_ratio()) {
                #[cfg(feature = "debug")]
                log::warn!("canvas resize failed: {}", _err);
            }
        }
    }

    pub fn clear_canvas(&mut self) {
        if let Some(ctx) = self.context.as_mut() {
            ctx.clear();
        }
    }

    fn prepare_canvas(&mut self) {
        if self.context.is_none() {
            self.create_canvas();
        } else {
            self.clear_canvas();
        }
    }

    /// Paint one frame: clear, clip to the mask, let the painter draw,
    /// restore the clip and complete the cycle
    pub fn draw(&mut self) {
        self.paint(None);
        self.complete_render();
    }

    fn paint(&mut self, zoom_param: Option<&ZoomParam>) {
        let (Some(layer), Some(map)) = (self.layer.clone(), self.map()) else {
            return;
        };
        self.prepare_canvas();
        let mask = layer.mask();
        let extent = self.extent_2d;
        let resources = self.resources.get_or_insert_with(ResourceCache::new);
        let Some(ctx) = self.context.as_mut() else {
            return;
        };

        let mut scope = ClipScope::enter(ctx, mask.as_deref(), extent, map.as_ref());
        layer.fire(LayerEvent::RenderStart);
        let result = match zoom_param {
            Some(param) => self.painter.draw_on_zooming(&mut scope, resources, map.as_ref(), param),
            None => self.painter.draw(&mut scope, resources, map.as_ref()),
        };
        drop(scope);

        if let Err(_err) = result {
            #[cfg(feature = "debug")]
            log::warn!("layer {}: draw failed: {}", layer.id(), _err);
        }
    }

    pub fn complete_render(&mut self) {
        self.request_map_to_render();
        self.fire_loaded_event();
    }

    /// Fire `renderend` and ask the map to redraw, unless map rendering is
    /// suppressed for the current zoom frame
    pub fn request_map_to_render(&self) {
        if self.suppress_map_render {
            return;
        }
        let Some(map) = self.map() else {
            return;
        };
        if self.context.is_some() {
            self.fire(LayerEvent::RenderEnd);
        }
        map.request_render();
    }

    fn fire_loaded_event(&mut self) {
        self.loaded = true;
        if !self.suppress_map_render {
            self.fire(LayerEvent::LayerLoad);
        }
    }

    /// The drawing surface together with the resources loaded for it
    pub fn get_paint_context(&mut self) -> Option<(&mut RenderContext, &ResourceCache)> {
        let ctx = self.context.as_mut()?;
        let resources = self.resources.get_or_insert_with(ResourceCache::new);
        Some((ctx, resources))
    }

    /// The last paint, when it still matches the map zoom
    pub fn canvas_image(&self) -> Option<CanvasImage<'_>> {
        let map = self.map()?;
        let ctx = self.context.as_ref()?;
        if self.render_zoom != Some(map.zoom()) {
            return None;
        }
        let extent = self.extent_2d?;
        if self.layer_is_empty() || self.painter.is_blank() {
            return None;
        }
        let north_west = self.north_west?;
        Some(CanvasImage {
            image: ctx.image(),
            point: map.point_to_container_point(north_west),
            size: extent.size(),
            transform: self.frozen_transform(),
        })
    }

    fn frozen_transform(&self) -> Option<Affine2> {
        self.gesture
            .transition()
            .and_then(|transition| transition.last_param())
            .map(|param| param.matrix.container)
    }

    fn draw_on_event(&mut self) {
        if !self.painted {
            self.render(true);
        } else {
            self.prepare_render();
            if self.layer.as_ref().is_some_and(|layer| layer.is_visible()) {
                self.draw();
            }
        }
    }

    fn settle_batches(&mut self) {
        if self.batches.is_empty() {
            return;
        }
        let mut batches = std::mem::take(&mut self.batches);
        let mut completed = 0;
        batches.retain_mut(|batch| {
            let done = self.poll_resources(batch);
            if done {
                completed += 1;
            }
            !done
        });
        batches.append(&mut self.batches);
        self.batches = batches;

        for _ in 0..completed {
            if self.layer.is_none() {
                break;
            }
            self.fire(LayerEvent::ResourceLoad);
            self.try_to_draw();
        }
    }
}

impl<P: CanvasPainter> LayerRenderer for CanvasRenderer<P> {
    fn render(&mut self) {
        CanvasRenderer::render(self, true);
    }

    fn tick(&mut self, _now: Instant) {
        if self.frame.take().is_some() && self.layer.is_some() {
            self.painted = true;
            self.draw();
        }
        self.settle_batches();
    }

    fn show(&mut self) {
        if let Some(mask) = self.layer.as_ref().and_then(|layer| layer.mask()) {
            mask.on_zoom_end();
        }
        CanvasRenderer::render(self, true);
    }

    fn hide(&mut self) {
        self.clear_canvas();
        self.request_map_to_render();
    }

    fn remove(&mut self) {
        self.frame.cancel();
        for batch in self.batches.drain(..) {
            batch.cancel();
        }
        self.painter.on_remove();
        self.north_west = None;
        self.context = None;
        self.extent_2d = None;
        self.resources = None;
        self.request_map_to_render();
        self.layer = None;
    }

    fn clear(&mut self) {
        self.clear_canvas();
    }

    fn set_z_index(&mut self, _z_index: i32) {
        self.request_map_to_render();
    }

    fn on_zoom_start(&mut self, to: f64) {
        let Some(map) = self.map() else {
            return;
        };
        self.gesture
            .begin_zoom(map.zoom(), to, Some(map.offset_platform()));
    }

    fn on_zooming(&mut self, param: &ZoomParam) {
        let Some(map) = self.map() else {
            return;
        };
        let Some(layer) = self.layer.clone() else {
            return;
        };
        if !layer.is_visible() {
            return;
        }
        self.suppress_map_render = true;
        self.prepare_render();
        if layer.canvas_options().update_when_zooming {
            self.paint(Some(param));
            self.complete_render();
        } else if map.pitch() == 0.0 {
            self.gesture.record(*param);
        } else {
            // a pitched map shows the layer blank rather than distorted
            self.prepare_canvas();
        }
        self.suppress_map_render = false;
    }

    fn on_zoom_end(&mut self) {
        let _transition = self.gesture.end();
        #[cfg(feature = "debug")]
        if _transition.as_ref().is_some_and(|t| !t.has_animated()) {
            log::debug!("zoom ended without intermediate frames");
        }
        self.draw_on_event();
    }

    fn on_moving(&mut self) {
        if self.map().is_some_and(|map| map.pitch() != 0.0) {
            self.draw_on_event();
        }
    }

    fn on_move_end(&mut self) {
        self.draw_on_event();
    }

    fn on_resize(&mut self) {
        self.extent_2d = None;
        self.resize_canvas(None);
        self.draw_on_event();
    }

    fn needs_redraw(&self) -> bool {
        self.redraw || self.frame.is_pending()
    }

    fn set_to_redraw(&mut self) {
        self.redraw = true;
    }

    /// Sample the alpha of the last paint under `point`. A surface tainted by
    /// cross-origin images disables hit testing for good.
    fn hit_detect(&mut self, point: Point) -> bool {
        if self.context.is_none() || self.layer_is_empty() || self.hit_test_disabled {
            return false;
        }
        let Some(map) = self.map() else {
            return false;
        };
        let extent = map.extent_2d();
        let size = extent.size();
        let detect = point.subtract(&extent.min);
        if detect.x < 0.0 || detect.x > size.width || detect.y < 0.0 || detect.y > size.height {
            return false;
        }
        let Some(ctx) = self.context.as_ref() else {
            return false;
        };
        match ctx.pixel_alpha(detect) {
            Ok(alpha) => alpha > 0,
            Err(SurfaceError::Tainted) => {
                #[cfg(feature = "debug")]
                log::warn!(
                    "hit detect failed with tainted canvas, some geometries have external resources in another domain"
                );
                self.hit_test_disabled = true;
                false
            }
            Err(SurfaceError::OutOfBounds { .. }) => false,
            Err(SurfaceError::Allocation { .. }) => false,
        }
    }
}
