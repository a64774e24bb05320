//! Drives a tile layer and a canvas layer without any display: tiles are
//! fetched from OpenStreetMap, the host "refresh" is a 16ms tokio interval.

use anyhow::Context;
use image::Rgba;
use maplayer::layers::tile::loader::HttpImageLoader;
use maplayer::layers::tile::{grid_for_view, UrlTemplateSource};
use maplayer::prelude::*;
use std::cell::RefCell;

struct DemoTileLayer {
    map: Rc<Viewport>,
    source: UrlTemplateSource,
    events: RefCell<Vec<LayerEvent>>,
}

impl LayerHost for DemoTileLayer {
    fn id(&self) -> String {
        "osm".to_string()
    }

    fn map(&self) -> Option<Rc<dyn MapView>> {
        Some(self.map.clone() as Rc<dyn MapView>)
    }

    fn is_visible(&self) -> bool {
        true
    }

    fn fire(&self, event: LayerEvent) {
        match &event {
            LayerEvent::TileError { tile, error } => println!("   tile {} failed: {}", tile.id, error),
            LayerEvent::LayerLoad => println!("   layer loaded"),
            _ => {}
        }
        self.events.borrow_mut().push(event);
    }
}

impl TileLayerHost for DemoTileLayer {
    fn tile_options(&self) -> TileLayerOptions {
        TileLayerOptions::default()
    }

    fn tile_grid(&self, zoom: Option<u8>) -> Option<TileGrid> {
        let zoom = zoom.unwrap_or_else(|| self.tile_zoom());
        Some(grid_for_view(self.map.as_ref(), &self.source, zoom, self.tile_size()))
    }

    fn tile_zoom(&self) -> u8 {
        self.map.zoom().round() as u8
    }

    fn tile_size(&self) -> Size {
        Size::new(256.0, 256.0)
    }
}

struct DemoCanvasLayer {
    map: Rc<Viewport>,
}

impl LayerHost for DemoCanvasLayer {
    fn id(&self) -> String {
        "crosshair".to_string()
    }

    fn map(&self) -> Option<Rc<dyn MapView>> {
        Some(self.map.clone() as Rc<dyn MapView>)
    }

    fn is_visible(&self) -> bool {
        true
    }

    fn fire(&self, event: LayerEvent) {
        println!("   canvas: {event}");
    }
}

impl CanvasLayerHost for DemoCanvasLayer {
    fn canvas_options(&self) -> CanvasLayerOptions {
        CanvasLayerOptions::default()
    }

    fn mask(&self) -> Option<Rc<dyn ClipMask>> {
        None
    }
}

/// Paints a crosshair over the view center
struct Crosshair;

impl CanvasPainter for Crosshair {
    fn draw(&mut self, ctx: &mut RenderContext, _resources: &ResourceCache, map: &dyn MapView) -> Result<()> {
        let size = map.size();
        let (cx, cy) = (size.width / 2.0, size.height / 2.0);
        let color = Rgba([220, 30, 30, 255]);
        ctx.fill_rect(Bounds::from_coords(cx - 10.0, cy - 1.0, cx + 10.0, cy + 1.0), color);
        ctx.fill_rect(Bounds::from_coords(cx - 1.0, cy - 10.0, cx + 1.0, cy + 10.0), color);
        Ok(())
    }
}

async fn run_frames(renderers: &mut [&mut dyn LayerRenderer], frames: usize) {
    let mut interval = tokio::time::interval(Duration::from_millis(16));
    for _ in 0..frames {
        interval.tick().await;
        let now = Instant::now();
        for renderer in renderers.iter_mut() {
            renderer.tick(now);
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    println!("Maplayer headless demo");
    println!("======================");

    // San Francisco at zoom 12, in 2D point coordinates
    let map = Rc::new(Viewport::new(
        Point::new(167_808.0, 405_376.0),
        12.0,
        Size::new(768.0, 512.0),
    ));

    let tile_layer = Rc::new(DemoTileLayer {
        map: map.clone(),
        source: UrlTemplateSource::openstreetmap(),
        events: RefCell::new(Vec::new()),
    });
    let loader: Rc<dyn ImageLoader> = Rc::new(HttpImageLoader::new());
    let mut tiles = TileLayerRenderer::new(tile_layer.clone(), loader.clone());

    let canvas_layer = Rc::new(DemoCanvasLayer { map: map.clone() });
    let mut canvas = CanvasRenderer::new(canvas_layer, loader, Crosshair);

    println!("\nInitial view:");
    tiles.render();
    canvas.render(true);
    run_frames(&mut [&mut tiles as &mut dyn LayerRenderer, &mut canvas], 120).await;
    println!("   {} tiles at zoom {:?}", tiles.tile_count(), tiles.tile_zoom());

    println!("\nPanning east by half a screen:");
    map.set_center(map.center_point(None).add(&Point::new(384.0, 0.0)));
    map.set_moving(true);
    tiles.on_move_start();
    tiles.draw_on_interacting();
    map.set_moving(false);
    tiles.on_move_end();
    tiles.render();
    canvas.on_move_end();
    run_frames(&mut [&mut tiles as &mut dyn LayerRenderer, &mut canvas], 120).await;
    println!("   {} tiles tracked", tiles.tile_count());

    println!("\nZooming in:");
    tiles.on_zoom_start(13.0);
    canvas.on_zoom_start(13.0);
    map.set_zooming(true);
    let origin = Point::new(384.0, 256.0);
    for step in 1..=4 {
        let param = ZoomParam::at(12.0, 13.0, 12.0 + step as f64 / 4.0, origin);
        tiles.on_zooming(&param);
        canvas.on_zooming(&param);
        tiles.draw_on_interacting();
    }
    map.set_zoom(13.0);
    map.set_zooming(false);
    tiles.on_zoom_end();
    canvas.on_zoom_end();
    tiles.render();
    run_frames(&mut [&mut tiles as &mut dyn LayerRenderer, &mut canvas], 180).await;
    println!("   {} tiles at zoom {:?}", tiles.tile_count(), tiles.tile_zoom());

    let loaded = tile_layer
        .events
        .borrow()
        .iter()
        .filter(|event| matches!(event, LayerEvent::TileLoad { .. }))
        .count();
    println!("\n{loaded} tile loads, {} map redraws requested", map.render_requests());

    let image = canvas
        .canvas_image()
        .context("canvas layer has not painted")?;
    println!("canvas raster {}x{}", image.image.width(), image.image.height());

    tiles.remove();
    canvas.remove();
    Ok(())
}
