//! Pruning and abort of tiles the view no longer needs

use super::layer::TileLayerRenderer;
use super::types::TilePhase;
use crate::core::{constants::EMPTY_IMAGE_URL, events::LayerEvent, geo::TileId};

impl TileLayerRenderer {
    /// Remove stale tiles of the current zoom and, with `prune_levels`, every
    /// tile and level container of other zooms
    pub(crate) fn prune_tiles(&mut self, prune_levels: bool) {
        let Some(map) = self.map() else {
            return;
        };
        if map.is_moving() && !map.is_zooming() {
            return;
        }
        self.abort_loading(false);

        let zoom = self.tile_zoom;
        let visible = self.layer.as_ref().is_some_and(|layer| layer.is_visible());
        if !visible {
            self.remove_all_tiles();
            return;
        }

        let stale: Vec<TileId> = self
            .tiles
            .values()
            .filter(|tile| Some(tile.zoom()) == zoom && !tile.is_current())
            .map(|tile| tile.id.clone())
            .collect();
        for id in stale {
            self.remove_tile(&id);
        }

        if prune_levels {
            let other_zoom: Vec<TileId> = self
                .tiles
                .values()
                .filter(|tile| Some(tile.zoom()) != zoom)
                .map(|tile| tile.id.clone())
                .collect();
            for id in other_zoom {
                self.remove_tile(&id);
            }
            self.prune_levels();
        }
    }

    /// Drop every level container except the current tile zoom's
    pub(crate) fn prune_levels(&mut self) {
        let zoom = self.tile_zoom;
        let Some(container) = &self.container else {
            return;
        };
        let levels: Vec<u8> = container
            .levels
            .keys()
            .copied()
            .filter(|z| Some(*z) != zoom)
            .collect();
        for z in levels {
            self.remove_tile_container(z);
        }
    }

    pub(crate) fn remove_tile_container(&mut self, zoom: u8) {
        let removed = self
            .container
            .as_mut()
            .and_then(|container| container.levels.remove(&zoom));
        if removed.is_none() {
            return;
        }
        #[cfg(feature = "debug")]
        log::debug!("removed level container {}", zoom);
        self.remove_tiles_at_zoom(zoom);
    }

    pub(crate) fn remove_tile(&mut self, id: &TileId) {
        let Some(tile) = self.tiles.remove(id) else {
            return;
        };
        if let TilePhase::Loading(task) = &tile.phase {
            task.cancel();
        }
        if let Some(level) = self
            .container
            .as_mut()
            .and_then(|container| container.levels.get_mut(&tile.zoom()))
        {
            level.tiles.retain(|tile_id| tile_id != id);
        }
        self.fire(LayerEvent::TileUnload { tile: tile.info() });
    }

    pub(crate) fn remove_tiles_at_zoom(&mut self, zoom: u8) {
        let ids: Vec<TileId> = self
            .tiles
            .values()
            .filter(|tile| tile.zoom() == zoom)
            .map(|tile| tile.id.clone())
            .collect();
        for id in ids {
            self.remove_tile(&id);
        }
    }

    pub(crate) fn remove_all_tiles(&mut self) {
        let ids: Vec<TileId> = self.tiles.keys().cloned().collect();
        for id in ids {
            self.remove_tile(&id);
        }
    }

    /// Release in-flight requests of tiles at another zoom or no longer
    /// current. Their element is pointed at a blank image; with
    /// `remove_element` it is detached right away.
    pub(crate) fn abort_loading(&mut self, remove_element: bool) {
        let zoom = self.tile_zoom;
        for tile in self.tiles.values_mut() {
            if Some(tile.zoom()) == zoom && tile.is_current() {
                continue;
            }
            let TilePhase::Loading(task) = &tile.phase else {
                continue;
            };
            task.cancel();
            tile.phase = TilePhase::Aborted;

            #[cfg(feature = "debug")]
            log::debug!("aborted tile {}", tile.id);

            if remove_element {
                tile.element = None;
            } else if let Some(element) = tile.element.as_mut() {
                element.src = EMPTY_IMAGE_URL.to_string();
            }
        }
    }
}
