//! Tile lifecycle: recompute, load, fade, prune and abort

mod common;

use common::{viewport, ManualImageLoader, MockTileLayer};
use maplayer::layers::tile::{ContainerTransform, TilePhase};
use maplayer::prelude::*;
use nalgebra::Matrix4;

fn setup() -> (Rc<Viewport>, Rc<MockTileLayer>, Rc<ManualImageLoader>, TileLayerRenderer) {
    let map = viewport(Point::new(512.0, 512.0), 2.0);
    let layer = MockTileLayer::new(map.clone());
    let loader = ManualImageLoader::new();
    let renderer = TileLayerRenderer::new(layer.clone(), loader.clone());
    (map, layer, loader, renderer)
}

fn id(s: &str) -> TileId {
    TileId::from(s)
}

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

#[test]
fn test_initial_render_creates_one_level() {
    let (_map, layer, loader, mut renderer) = setup();
    renderer.render();

    assert_eq!(renderer.tile_zoom(), Some(2));
    assert_eq!(renderer.tile_count(), 4);
    assert_eq!(loader.request_count(), 4);
    let level = renderer.level(2).expect("level container for zoom 2");
    assert_eq!(level.tiles.len(), 4);
    assert!(renderer.tiles().all(|tile| tile.phase.is_loading()));
    assert!(renderer
        .tiles()
        .all(|tile| tile.element.as_ref().is_some_and(|e| e.opacity == 0.0)));
    // nothing settled yet
    assert_eq!(layer.count("layerload"), 0);
}

#[test]
fn test_pan_keeps_shared_tiles_and_creates_the_rest() {
    let (map, _layer, loader, mut renderer) = setup();
    renderer.render();

    map.set_center(Point::new(768.0, 512.0));
    renderer.render();

    // {1,2} x {1,2} -> {2,3} x {1,2}: two tiles kept, two created
    assert_eq!(loader.request_count(), 6);
    assert_eq!(&loader.urls()[4..], ["tiles/2/3/1.png", "tiles/2/3/2.png"]);
    assert_eq!(renderer.tile_count(), 6);

    for current in ["2_1_2", "3_1_2", "2_2_2", "3_2_2"] {
        assert!(renderer.tile(&id(current)).is_some_and(|t| t.is_current()), "{current}");
    }
    for stale in ["1_1_2", "1_2_2"] {
        assert!(renderer.tile(&id(stale)).is_some_and(|t| !t.is_current()), "{stale}");
    }

    // new tiles line up with the tiles placed before the anchor drifted
    let placed = renderer.tile(&id("2_1_2")).map(|t| t.view_point);
    let created = renderer.tile(&id("3_1_2")).map(|t| t.view_point);
    assert_eq!(placed, Some(Point::new(128.0, -128.0)));
    assert_eq!(created, Some(Point::new(384.0, -128.0)));
}

#[test]
fn test_rerender_without_changes_fires_layerload() {
    let (_map, layer, loader, mut renderer) = setup();
    renderer.render();
    renderer.render();

    assert_eq!(loader.request_count(), 4);
    assert_eq!(layer.count("layerload"), 1);
}

#[test]
fn test_failed_tile_still_counts_toward_prune() {
    let (map, layer, loader, mut renderer) = setup();
    let t0 = Instant::now();
    renderer.render();
    loader.succeed_all();
    renderer.tick(t0);
    assert_eq!(layer.count("tileload"), 4);
    assert_eq!(layer.count("layerload"), 1);
    assert!(renderer.is_prune_pending());

    map.set_center(Point::new(768.0, 512.0));
    renderer.render();
    layer.clear_events();

    loader.fail("tiles/2/3/1.png", LoadError::Http(404));
    loader.succeed("tiles/2/3/2.png");
    let t1 = t0 + ms(20);
    renderer.tick(t1);

    assert_eq!(layer.count("tileerror"), 1);
    assert_eq!(layer.count("tileload"), 2);
    assert_eq!(layer.count("layerload"), 1);
    let failed = renderer.tile(&id("3_1_2")).expect("failed tile is kept");
    assert!(matches!(failed.phase, TilePhase::Loaded { error: Some(LoadError::Http(404)), .. }));
    assert!(failed.element.as_ref().is_some_and(|e| !e.visible));

    // zoom animation duration plus padding
    renderer.tick(t1 + ms(300));
    assert_eq!(renderer.tile_count(), 6);
    renderer.tick(t1 + ms(360));
    assert_eq!(renderer.tile_count(), 4);
    assert_eq!(layer.count("tileunload"), 2);
    assert!(!renderer.is_prune_pending());
}

#[test]
fn test_error_tile_url_replaces_failed_image() {
    let (_map, layer, loader, mut renderer) = setup();
    layer.options.borrow_mut().error_tile_url = Some("blank.png".to_string());
    let t0 = Instant::now();
    renderer.render();

    loader.fail("tiles/2/1/1.png", LoadError::Network("reset".into()));
    renderer.tick(t0);

    assert_eq!(loader.urls().last().map(String::as_str), Some("blank.png"));
    let tile = renderer.tile(&id("1_1_2")).expect("tile");
    let element = tile.element.as_ref().expect("element");
    assert_eq!(element.src, "blank.png");
    assert!(element.visible);
    assert!(element.image.is_none());
    assert_eq!(layer.count("tileerror"), 1);
    assert_eq!(layer.count("tileload"), 1);

    loader.succeed("blank.png");
    renderer.tick(t0 + ms(16));
    let element = renderer.tile(&id("1_1_2")).and_then(|t| t.element.as_ref());
    assert!(element.is_some_and(|e| e.image.is_some()));
}

#[test]
fn test_fade_runs_on_a_single_frame_request() {
    let (_map, _layer, loader, mut renderer) = setup();
    let t0 = Instant::now();
    renderer.render();
    loader.succeed_all();
    renderer.tick(t0);
    assert!(renderer.is_fade_pending());

    renderer.tick(t0 + ms(50));
    assert!(renderer.is_fade_pending());
    for tile in renderer.tiles() {
        let opacity = tile.element.as_ref().map_or(0.0, |e| e.opacity);
        assert!((opacity - 0.25).abs() < 1e-6, "opacity {opacity}");
    }

    renderer.tick(t0 + ms(250));
    assert!(!renderer.is_fade_pending());
    assert!(renderer.tiles().all(|tile| tile.is_active()));
    assert!(renderer
        .tiles()
        .all(|tile| tile.element.as_ref().is_some_and(|e| e.opacity == 1.0)));
}

#[test]
fn test_without_fade_tiles_show_at_once() {
    let map = viewport(Point::new(512.0, 512.0), 2.0);
    let layer = MockTileLayer::new(map);
    layer.options.borrow_mut().fade_animation = false;
    let loader = ManualImageLoader::new();
    let mut renderer = TileLayerRenderer::new(layer.clone(), loader.clone());
    assert!(!renderer.is_fade_animated());

    renderer.render();
    assert_eq!(loader.request_count(), 4);
    loader.succeed_all();
    renderer.tick(Instant::now());
    assert!(!renderer.is_fade_pending());
    assert!(renderer.tiles().all(|tile| tile.is_active()));
    assert!(renderer
        .tiles()
        .all(|tile| tile.element.as_ref().is_some_and(|e| e.opacity == 1.0)));
    assert_eq!(layer.count("layerload"), 1);
}

#[test]
fn test_zoom_end_without_frames_drops_the_level() {
    let (_map, layer, _loader, mut renderer) = setup();
    renderer.render();
    assert!(renderer.level(2).is_some());

    renderer.on_zoom_start(3.0);
    assert!(!renderer.is_fade_animated());
    renderer.on_zoom_end();

    assert!(renderer.level(2).is_none());
    assert_eq!(renderer.tile_count(), 0);
    assert_eq!(layer.count("tileunload"), 4);
    assert!(renderer.is_fade_animated());
    assert!(renderer.needs_redraw());
}

#[test]
fn test_zoom_frames_transform_the_level() {
    let (map, _layer, _loader, mut renderer) = setup();
    renderer.render();

    map.set_platform_offset(Point::new(10.4, -3.6));
    renderer.on_zoom_start(3.0);
    map.set_zooming(true);
    let param = ZoomParam::at(2.0, 3.0, 2.5, Point::new(128.0, 128.0));
    renderer.on_zooming(&param);
    renderer.draw_on_interacting();

    let level = renderer.level(2).expect("level");
    assert_eq!(level.transform, Some(ContainerTransform::Affine(param.matrix.view)));

    map.set_zooming(false);
    renderer.on_zoom_end();
    let level = renderer.level(2).expect("level survives an animated zoom");
    assert_eq!(level.position, Some(Point::new(10.0, -4.0)));
}

#[test]
fn test_fractional_zoom_scales_tiles_in_2d() {
    let map = viewport(Point::new(512.0, 512.0), 2.4);
    let layer = MockTileLayer::new(map.clone());
    let loader = ManualImageLoader::new();
    let mut renderer = TileLayerRenderer::new(layer, loader);
    renderer.render();

    let level = renderer.level(2).expect("level");
    assert_eq!(level.transform, None);
    let transform = level.tile_transform.expect("fractional scale");
    assert!((transform.scale() - 2_f64.powf(0.4)).abs() < 1e-9);
}

#[test]
fn test_perspective_matrix_uses_3d_container() {
    let (map, _layer, _loader, mut renderer) = setup();
    map.set_dom_css_matrix(Some(Matrix4::identity()));
    map.set_view_point(Point::new(5.0, 7.0));
    renderer.render();

    let level = renderer.level(2).expect("level");
    assert_eq!(level.size, Some(Size::new(256.0, 256.0)));
    match level.transform {
        Some(ContainerTransform::Perspective { translate, .. }) => {
            assert_eq!(translate, Point::new(-5.0, -7.0));
        }
        other => panic!("expected a perspective transform, got {other:?}"),
    }
    assert!(level.tile_transform.is_some());
}

#[test]
fn test_zoom_start_aborts_stale_loads() {
    let (map, layer, loader, mut renderer) = setup();
    renderer.render();
    map.set_center(Point::new(768.0, 512.0));
    renderer.render();

    renderer.on_zoom_start(3.0);

    assert!(loader.is_cancelled("tiles/2/1/1.png"));
    assert!(loader.is_cancelled("tiles/2/1/2.png"));
    assert!(!loader.is_cancelled("tiles/2/2/1.png"));
    assert!(!loader.is_cancelled("tiles/2/3/2.png"));
    assert_eq!(renderer.tile_count(), 4);
    assert_eq!(layer.count("tileunload"), 2);

    // late results for released requests are dropped
    loader.succeed("tiles/2/1/1.png");
    renderer.tick(Instant::now());
    assert_eq!(layer.count("tileload"), 0);
}

#[test]
fn test_panning_does_not_prune() {
    let (map, _layer, loader, mut renderer) = setup();
    let t0 = Instant::now();
    renderer.render();
    loader.succeed_all();
    renderer.tick(t0);

    map.set_center(Point::new(768.0, 512.0));
    renderer.render();
    loader.succeed_all();
    map.set_moving(true);
    renderer.tick(t0 + ms(10));
    // interacting: only other levels are pruned
    assert!(!renderer.is_prune_pending());
    assert_eq!(renderer.tile_count(), 6);
}

#[test]
fn test_hide_clears_and_show_rerenders() {
    let (_map, _layer, loader, mut renderer) = setup();
    renderer.render();

    renderer.hide();
    assert_eq!(renderer.tile_count(), 0);
    assert!(renderer.container().is_some_and(|c| !c.visible));
    assert!(loader.is_cancelled("tiles/2/1/1.png"));

    renderer.show();
    assert_eq!(renderer.tile_count(), 4);
    assert_eq!(loader.request_count(), 8);
    assert!(renderer.container().is_some_and(|c| c.visible));
}

#[test]
fn test_remove_releases_everything() {
    let (_map, _layer, loader, mut renderer) = setup();
    renderer.render();
    renderer.remove();

    assert_eq!(renderer.tile_count(), 0);
    assert!(renderer.container().is_none());
    assert!(loader.urls().iter().all(|url| loader.is_cancelled(url)));

    renderer.render();
    assert_eq!(loader.request_count(), 4);
}

#[test]
fn test_seam_fix_grows_tiles_while_zooming() {
    let (map, layer, _loader, mut renderer) = setup();
    layer.options.borrow_mut().seam_fix = true;
    renderer.render();
    assert!(renderer.tiles().all(|t| t.size == Size::new(256.0, 256.0)));

    map.set_zooming(true);
    renderer.on_zoom_start(3.0);
    assert!(renderer.tiles().all(|t| t.size == Size::new(257.0, 257.0)));
}
