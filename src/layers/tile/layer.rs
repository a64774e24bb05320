//! Core tile lifecycle: recompute, create, load and fade tiles

use super::types::{GridTile, LayerContainer, LevelContainer, Retention, Tile, TileGrid, TileImage, TilePhase};
use crate::{
    core::{
        bounds::Bounds,
        constants::PRUNE_PADDING_MS,
        events::LayerEvent,
        geo::{Point, Size, TileId},
        gesture::GestureState,
        viewport::MapView,
    },
    layers::{
        base::TileLayerHost,
        tile::loader::{ImageLoader, LoadRequest, LoadResult},
    },
    prelude::{Duration, HashMap, Instant, Rc},
    rendering::scheduler::{Deferred, FrameSlot},
};

/// Keeps the tiles of one tile layer in step with the map view.
///
/// Tiles are created at zero opacity on their final position, loaded
/// through the [`ImageLoader`], faded in and pruned once the view no longer
/// needs them. During gestures only the level containers are transformed.
pub struct TileLayerRenderer {
    pub(crate) layer: Option<Rc<dyn TileLayerHost>>,
    pub(crate) loader: Rc<dyn ImageLoader>,
    pub(crate) tiles: HashMap<TileId, Tile>,
    pub(crate) container: Option<LayerContainer>,
    pub(crate) z_index: Option<i32>,
    pub(crate) tile_zoom: Option<u8>,
    pub(crate) tile_extent: Option<Bounds>,
    /// First anchor seen at the current tile zoom
    pub(crate) anchor: Option<(u8, Point)>,
    pub(crate) center_offset: Option<Point>,
    pub(crate) gesture: GestureState,
    pub(crate) fade_animated: bool,
    pub(crate) fade_frame: FrameSlot<()>,
    /// Deferred prune; the payload says whether other levels go too
    pub(crate) prune_timer: Deferred<bool>,
    pub(crate) preloaded: bool,
    pub(crate) redraw: bool,
}

impl TileLayerRenderer {
    pub fn new(layer: Rc<dyn TileLayerHost>, loader: Rc<dyn ImageLoader>) -> Self {
        let fade_animated = layer.tile_options().fade_animation;
        Self {
            layer: Some(layer),
            loader,
            tiles: HashMap::default(),
            container: None,
            z_index: None,
            tile_zoom: None,
            tile_extent: None,
            anchor: None,
            center_offset: None,
            gesture: GestureState::default(),
            fade_animated,
            fade_frame: FrameSlot::new(),
            prune_timer: Deferred::new(),
            preloaded: false,
            redraw: false,
        }
    }

    pub(crate) fn map(&self) -> Option<Rc<dyn MapView>> {
        self.layer.as_ref()?.map()
    }

    pub(crate) fn fire(&self, event: LayerEvent) {
        if let Some(layer) = &self.layer {
            layer.fire(event);
        }
    }

    pub fn tiles(&self) -> impl Iterator<Item = &Tile> {
        self.tiles.values()
    }

    pub fn tile(&self, id: &TileId) -> Option<&Tile> {
        self.tiles.get(id)
    }

    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    pub fn container(&self) -> Option<&LayerContainer> {
        self.container.as_ref()
    }

    pub fn level(&self, zoom: u8) -> Option<&LevelContainer> {
        self.container.as_ref()?.levels.get(&zoom)
    }

    pub fn tile_zoom(&self) -> Option<u8> {
        self.tile_zoom
    }

    pub fn is_fade_animated(&self) -> bool {
        self.fade_animated
    }

    pub fn is_prune_pending(&self) -> bool {
        self.prune_timer.is_pending()
    }

    pub fn is_fade_pending(&self) -> bool {
        self.fade_frame.is_pending()
    }

    /// Recompute the needed tiles and create the missing ones
    pub(crate) fn render_tiles(&mut self) {
        self.redraw = false;
        let Some(layer) = self.layer.clone() else {
            return;
        };
        if self.container.is_none() {
            self.create_layer_container(layer.as_ref());
        }
        let grid = match layer.tile_grid(None) {
            Some(grid) if !grid.tiles.is_empty() => grid,
            _ => return,
        };

        let queue = self.tile_queue(grid.tiles.clone(), &grid);

        self.tile_zoom = Some(grid.zoom);
        self.tile_extent = Some(grid.extent);

        self.update_container();

        let nothing_queued = queue.is_empty();
        if !nothing_queued {
            #[cfg(feature = "debug")]
            log::debug!("queueing {} new tiles at zoom {}", queue.len(), grid.zoom);

            for tile in queue {
                self.load_tile(tile, layer.as_ref());
            }
        }
        self.update_tile_size();
        if nothing_queued {
            self.fire(LayerEvent::LayerLoad);
        }
    }

    /// Split the grid into tiles already tracked (marked current again) and
    /// new tiles to create, in grid order. New tiles are shifted by the
    /// anchor drift so they line up with the tiles already placed.
    pub(crate) fn tile_queue(&mut self, tiles: Vec<GridTile>, grid: &TileGrid) -> Vec<GridTile> {
        for tile in self.tiles.values_mut() {
            tile.retention = Retention::Stale;
        }

        let offset = match self.anchor {
            Some((zoom, anchor)) if zoom == grid.zoom => Some(grid.anchor.subtract(&anchor)),
            _ => {
                self.anchor = Some((grid.zoom, grid.anchor));
                None
            }
        };

        let mut queue = Vec::new();
        for mut tile in tiles {
            if let Some(existing) = self.tiles.get_mut(&tile.id) {
                existing.retention = Retention::Current;
                continue;
            }
            if let Some(offset) = offset.filter(|o| !o.is_zero()) {
                tile.view_point = tile.view_point.subtract(&offset);
            }
            queue.push(tile);
        }

        self.center_offset = offset.or(Some(Point::zero()));
        queue
    }

    pub(crate) fn create_layer_container(&mut self, layer: &dyn TileLayerHost) {
        let panel = layer.tile_options().container;
        self.container = Some(LayerContainer::new(panel, self.z_index));
    }

    /// The level container for `zoom`, created on first use
    pub(crate) fn level_container(&mut self, zoom: u8) -> Option<&mut LevelContainer> {
        let container = self.container.as_mut()?;
        Some(
            container
                .levels
                .entry(zoom)
                .or_insert_with(|| LevelContainer::new(zoom)),
        )
    }

    fn load_tile(&mut self, tile: GridTile, layer: &dyn TileLayerHost) {
        let options = layer.tile_options();
        let size = self.tile_size();
        let element = TileImage {
            src: tile.url.clone(),
            position: tile.view_point,
            size,
            opacity: 0.0,
            visible: true,
            cross_origin: options.cross_origin.clone(),
            css_filter: options.css_filter.clone(),
            image: None,
        };
        let request = LoadRequest::new(tile.url.clone()).with_cross_origin(options.cross_origin);
        let task = self.loader.load(request);

        if let Some(level) = self.level_container(tile.coord.z) {
            level.tiles.push(tile.id.clone());
        }
        self.tiles.insert(
            tile.id.clone(),
            Tile {
                coord: tile.coord,
                id: tile.id,
                url: tile.url,
                view_point: tile.view_point,
                size,
                retention: Retention::Current,
                phase: TilePhase::Loading(task),
                element: Some(element),
                fallback: None,
            },
        );
    }

    /// Advance fades, settle finished loads and run a due prune
    pub(crate) fn tick_tiles(&mut self, now: Instant) {
        if self.fade_frame.take().is_some() {
            self.update_opacity(now);
        }

        let settled: Vec<(TileId, LoadResult)> = self
            .tiles
            .values()
            .filter_map(|tile| match &tile.phase {
                TilePhase::Loading(task) => task.poll().map(|result| (tile.id.clone(), result)),
                _ => None,
            })
            .collect();
        for (id, result) in settled {
            self.tile_ready(&id, result, now);
        }
        self.poll_fallbacks();

        if let Some(prune_levels) = self.prune_timer.take_due(now) {
            self.prune_tiles(prune_levels);
        }
    }

    fn poll_fallbacks(&mut self) {
        for tile in self.tiles.values_mut() {
            let Some(result) = tile.fallback.as_ref().and_then(|task| task.poll()) else {
                continue;
            };
            tile.fallback = None;
            if let Some(element) = tile.element.as_mut() {
                match result {
                    Ok(image) => element.image = Some(image),
                    Err(_) => element.visible = false,
                }
            }
        }
    }

    /// A tile's image settled, successfully or not
    pub(crate) fn tile_ready(&mut self, id: &TileId, result: LoadResult, now: Instant) {
        let Some(layer) = self.layer.clone() else {
            return;
        };
        let fade_animated = self.fade_animated;
        let error_tile_url = layer.tile_options().error_tile_url;
        let Some(tile) = self.tiles.get_mut(id) else {
            return;
        };

        let error = match result {
            Ok(image) => {
                if let Some(element) = tile.element.as_mut() {
                    element.image = Some(image);
                }
                None
            }
            Err(err) => {
                #[cfg(feature = "debug")]
                log::warn!("tile {} failed to load: {}", tile.id, err);

                if let Some(element) = tile.element.as_mut() {
                    match &error_tile_url {
                        Some(url) => {
                            element.src = url.clone();
                            tile.fallback = Some(self.loader.load(
                                LoadRequest::new(url.clone())
                                    .with_cross_origin(element.cross_origin.clone()),
                            ));
                        }
                        None => element.visible = false,
                    }
                }
                Some(err)
            }
        };

        if let Some(err) = &error {
            layer.fire(LayerEvent::TileError {
                tile: tile.info(),
                error: err.clone(),
            });
        }

        if fade_animated {
            if let Some(element) = tile.element.as_mut() {
                element.opacity = 0.0;
            }
            tile.phase = TilePhase::Loaded { at: now, error };
            self.fade_frame.request(());
        } else {
            if let Some(element) = tile.element.as_mut() {
                element.opacity = 1.0;
            }
            tile.phase = TilePhase::Active { at: now };
        }

        layer.fire(LayerEvent::TileLoad { tile: tile.info() });

        if self.no_tiles_to_load() {
            self.prune_timer.cancel();
            let Some(map) = layer.map() else {
                return;
            };
            if map.is_interacting() {
                self.prune_levels();
            } else {
                layer.fire(LayerEvent::LayerLoad);
                let options = map.options();
                let prune_levels = if map.is_base_layer(&layer.id()) {
                    !options.zoom_background
                } else {
                    true
                };
                let delay = options.zoom_animation_duration() + Duration::from_millis(PRUNE_PADDING_MS);
                self.prune_timer.schedule(now, delay, prune_levels);
            }
        }
    }

    /// Whether every tracked tile has settled
    pub(crate) fn no_tiles_to_load(&self) -> bool {
        self.tiles.values().all(|tile| !tile.phase.is_loading())
    }

    /// One fade step: opacity ramps linearly over the fade duration for
    /// every current, loaded tile
    pub(crate) fn update_opacity(&mut self, now: Instant) {
        let Some(layer) = &self.layer else {
            return;
        };
        if layer.map().is_none() {
            return;
        }
        let duration = layer.tile_options().fade_duration().as_secs_f64();
        let mut next_frame = false;

        for tile in self.tiles.values_mut() {
            if !tile.is_current() {
                continue;
            }
            let TilePhase::Loaded { at, .. } = tile.phase else {
                continue;
            };
            let elapsed = now.saturating_duration_since(at).as_secs_f64();
            let fade = if duration > 0.0 {
                (elapsed / duration).min(1.0)
            } else {
                1.0
            };
            if let Some(element) = tile.element.as_mut() {
                element.opacity = fade as f32;
            }
            if fade < 1.0 {
                next_frame = true;
            } else {
                tile.phase = TilePhase::Active { at };
            }
        }

        if next_frame {
            self.fade_frame.request(());
        }
    }

    /// Tile size, enlarged by one pixel while transformed when the seam fix
    /// is on
    pub(crate) fn tile_size(&self) -> Size {
        let Some(layer) = &self.layer else {
            return Size::new(0.0, 0.0);
        };
        let mut size = layer.tile_size();
        let Some(map) = layer.map() else {
            return size;
        };
        let off_zoom = self.tile_zoom.map_or(true, |z| map.zoom() != z as f64);
        if layer.tile_options().seam_fix && (map.is_transforming() || map.is_zooming() || off_zoom)
        {
            size.width += 1.0;
            size.height += 1.0;
        }
        size
    }

    /// Resize the images of current tiles after the tile size changed
    pub(crate) fn update_tile_size(&mut self) {
        let size = self.tile_size();
        for tile in self.tiles.values_mut() {
            if !tile.is_current() || tile.size == size {
                continue;
            }
            tile.size = size;
            if let Some(element) = tile.element.as_mut() {
                element.size = size;
            }
        }
    }

    pub(crate) fn preload_tiles(&mut self, tiles: &[GridTile]) {
        self.preloaded = true;
        let cross_origin = self
            .layer
            .as_ref()
            .and_then(|layer| layer.tile_options().cross_origin);
        for tile in tiles {
            self.loader
                .prefetch(LoadRequest::new(tile.url.clone()).with_cross_origin(cross_origin.clone()));
        }
    }
}
