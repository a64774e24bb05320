//! Hosts and loaders shared by the integration tests

#![allow(dead_code)]

use image::{Rgba, RgbaImage};
use maplayer::layers::tile::loader::{load_channel, LoadCompleter, LoadResult};
use maplayer::layers::tile::{grid_for_view, TileGrid, UrlTemplateSource};
use maplayer::prelude::*;
use maplayer::{CanvasLayerOptions, LayerEvent, TileLayerOptions};
use std::cell::{Cell, RefCell};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn viewport(center: Point, zoom: f64) -> Rc<Viewport> {
    init_logging();
    Rc::new(Viewport::new(center, zoom, Size::new(256.0, 256.0)))
}

pub fn solid_image(width: u32, height: u32) -> ImageHandle {
    Arc::new(RgbaImage::from_pixel(width, height, Rgba([40, 80, 120, 255])))
}

/// Records every request and settles them on demand by url
#[derive(Default)]
pub struct ManualImageLoader {
    requests: RefCell<Vec<LoadRequest>>,
    pending: RefCell<Vec<(String, LoadCompleter)>>,
}

impl ManualImageLoader {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub fn requests(&self) -> Vec<LoadRequest> {
        self.requests.borrow().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.borrow().len()
    }

    pub fn urls(&self) -> Vec<String> {
        self.requests.borrow().iter().map(|r| r.url.clone()).collect()
    }

    pub fn settle(&self, url: &str, result: LoadResult) {
        self.pending.borrow_mut().retain(|(pending, completer)| {
            if pending != url {
                return true;
            }
            completer.complete(result.clone());
            false
        });
    }

    pub fn succeed(&self, url: &str) {
        self.settle(url, Ok(solid_image(4, 4)));
    }

    pub fn fail(&self, url: &str, error: LoadError) {
        self.settle(url, Err(error));
    }

    pub fn succeed_all(&self) {
        for (_, completer) in self.pending.borrow_mut().drain(..) {
            completer.complete(Ok(solid_image(4, 4)));
        }
    }

    /// Whether the loader was told to give up on `url`
    pub fn is_cancelled(&self, url: &str) -> bool {
        self.pending
            .borrow()
            .iter()
            .any(|(pending, completer)| pending == url && completer.is_cancelled())
    }
}

impl ImageLoader for ManualImageLoader {
    fn load(&self, request: LoadRequest) -> LoadTask {
        let (completer, task) = load_channel();
        self.pending.borrow_mut().push((request.url.clone(), completer));
        self.requests.borrow_mut().push(request);
        task
    }
}

pub struct MockTileLayer {
    pub map: Option<Rc<Viewport>>,
    pub options: RefCell<TileLayerOptions>,
    pub source: UrlTemplateSource,
    pub visible: Cell<bool>,
    pub events: RefCell<Vec<LayerEvent>>,
}

impl MockTileLayer {
    pub fn new(map: Rc<Viewport>) -> Rc<Self> {
        Rc::new(Self {
            map: Some(map),
            options: RefCell::new(TileLayerOptions::default()),
            source: UrlTemplateSource::new("tiles/{z}/{x}/{y}.png"),
            visible: Cell::new(true),
            events: RefCell::new(Vec::new()),
        })
    }

    pub fn event_names(&self) -> Vec<&'static str> {
        self.events.borrow().iter().map(LayerEvent::name).collect()
    }

    pub fn count(&self, name: &str) -> usize {
        self.events.borrow().iter().filter(|e| e.name() == name).count()
    }

    pub fn clear_events(&self) {
        self.events.borrow_mut().clear();
    }
}

impl LayerHost for MockTileLayer {
    fn id(&self) -> String {
        "tiles".to_string()
    }

    fn map(&self) -> Option<Rc<dyn MapView>> {
        self.map.clone().map(|map| map as Rc<dyn MapView>)
    }

    fn is_visible(&self) -> bool {
        self.visible.get()
    }

    fn fire(&self, event: LayerEvent) {
        self.events.borrow_mut().push(event);
    }
}

impl TileLayerHost for MockTileLayer {
    fn tile_options(&self) -> TileLayerOptions {
        self.options.borrow().clone()
    }

    fn tile_grid(&self, zoom: Option<u8>) -> Option<TileGrid> {
        let map = self.map.as_ref()?;
        let zoom = zoom.unwrap_or_else(|| self.tile_zoom());
        Some(grid_for_view(map.as_ref(), &self.source, zoom, self.tile_size()))
    }

    fn tile_zoom(&self) -> u8 {
        self.map.as_ref().map_or(0, |map| map.zoom().round() as u8)
    }

    fn tile_size(&self) -> Size {
        Size::new(256.0, 256.0)
    }
}

/// Clip mask covering a fixed extent; counts how often it was painted
pub struct RectMask {
    pub extent: Bounds,
    pub painted: Cell<usize>,
}

impl ClipMask for RectMask {
    fn extent_2d(&self) -> Bounds {
        self.extent
    }

    fn paint_clip(&self, ctx: &mut RenderContext, map: &dyn MapView) {
        self.painted.set(self.painted.get() + 1);
        let min = map.point_to_container_point(self.extent.min);
        let max = map.point_to_container_point(self.extent.max);
        ctx.clip_rect(Bounds::new(min, max));
    }
}

pub struct MockCanvasLayer {
    pub map: Option<Rc<Viewport>>,
    pub options: RefCell<CanvasLayerOptions>,
    pub mask: RefCell<Option<Rc<RectMask>>>,
    pub visible: Cell<bool>,
    pub empty: Cell<bool>,
    pub events: RefCell<Vec<LayerEvent>>,
}

impl MockCanvasLayer {
    pub fn new(map: Rc<Viewport>) -> Rc<Self> {
        Rc::new(Self {
            map: Some(map),
            options: RefCell::new(CanvasLayerOptions::default()),
            mask: RefCell::new(None),
            visible: Cell::new(true),
            empty: Cell::new(false),
            events: RefCell::new(Vec::new()),
        })
    }

    pub fn event_names(&self) -> Vec<&'static str> {
        self.events.borrow().iter().map(LayerEvent::name).collect()
    }

    pub fn count(&self, name: &str) -> usize {
        self.events.borrow().iter().filter(|e| e.name() == name).count()
    }
}

impl LayerHost for MockCanvasLayer {
    fn id(&self) -> String {
        "canvas".to_string()
    }

    fn map(&self) -> Option<Rc<dyn MapView>> {
        self.map.clone().map(|map| map as Rc<dyn MapView>)
    }

    fn is_visible(&self) -> bool {
        self.visible.get()
    }

    fn fire(&self, event: LayerEvent) {
        self.events.borrow_mut().push(event);
    }
}

impl CanvasLayerHost for MockCanvasLayer {
    fn canvas_options(&self) -> CanvasLayerOptions {
        self.options.borrow().clone()
    }

    fn mask(&self) -> Option<Rc<dyn ClipMask>> {
        self.mask.borrow().clone().map(|mask| mask as Rc<dyn ClipMask>)
    }

    fn is_empty(&self) -> bool {
        self.empty.get()
    }
}

/// Paints a filled square at the container origin, plus every resource it
/// finds in the cache
#[derive(Default)]
pub struct SquarePainter {
    pub resources: Vec<ResourceKey>,
    pub draws: usize,
    pub zoom_draws: usize,
    /// Clip seen by the last draw
    pub clip_during_draw: Option<Bounds>,
    pub drawn_images: usize,
    pub fail: bool,
}

impl CanvasPainter for SquarePainter {
    fn check_resources(&self) -> Vec<ResourceKey> {
        self.resources.clone()
    }

    fn draw(
        &mut self,
        ctx: &mut RenderContext,
        resources: &ResourceCache,
        _map: &dyn MapView,
    ) -> maplayer::Result<()> {
        self.draws += 1;
        self.clip_during_draw = ctx.clip();
        ctx.fill_rect(
            Bounds::from_coords(0.0, 0.0, 16.0, 16.0),
            Rgba([255, 0, 0, 255]),
        );
        for key in &self.resources {
            if let Some(image) = resources.get_image(key) {
                ctx.draw_image(&image, Point::new(32.0, 32.0), None, 1.0);
                self.drawn_images += 1;
            }
        }
        if self.fail {
            return Err(MapError::Render("painter failed".into()));
        }
        Ok(())
    }

    fn draw_on_zooming(
        &mut self,
        ctx: &mut RenderContext,
        resources: &ResourceCache,
        map: &dyn MapView,
        _param: &ZoomParam,
    ) -> maplayer::Result<()> {
        self.zoom_draws += 1;
        self.draw(ctx, resources, map)
    }
}
