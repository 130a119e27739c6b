// The 3D tile grid and the spatial index over placed objects.
//
// `TileMap` owns a flat `Vec<Tile>` (index = z·sy·sx + y·sx + x) and a
// `BTreeMap<ObjectId, PlacedObject>` of everything currently placed. It is
// the only code that changes an object's owning tile or intersecting tiles.
//
// Insert resolves the owning tile from the object's anchor (foot-anchored
// kinds own the tile their base is in), registers the object in every tile
// its bounds overlap, files it into the owner's draw list for its layer, and
// for structural kinds recomputes the cached fields of the owner and of the
// neighbours that read it (west and north for face costs, above for
// support). Move is remove-then-insert. Bad positions are clamped with a
// warning; non-finite ones are rejected with an error log and leave the map
// untouched. Nothing here panics on caller input.
//
// Ray collision lives in `collision.rs` and path search in
// `pathfinding.rs`, both as further `impl TileMap` blocks.
//
// The map is derived state: `Battle` skips it when serializing and rebuilds
// it by re-inserting every persisted object (`rebuild_transient_state`). The
// `Default` impl is a zero-sized map.
//
// See also: `tile.rs` for the per-tile caches, `object.rs` for the
// `TileObject` contract, `config.rs` for `TileMapConfig`.
//
// **Critical constraint: determinism.** Objects and per-tile sets are
// ordered collections so iteration order never depends on hashing.

use crate::config::{MovementRules, TileMapConfig};
use crate::error::{BattleError, BattleResult};
use crate::object::{PlacedObject, TileObject};
use crate::tile::Tile;
use crate::types::{ObjectId, ObjectKind, TileCoord, TileIndex, WorldPos};
use smallvec::SmallVec;
use std::collections::BTreeMap;
use std::ops::RangeInclusive;

/// Margin keeping clamped positions strictly inside the last tile.
const CLAMP_MARGIN: f32 = 1e-3;

#[derive(Clone, Debug)]
pub struct TileMap {
    config: TileMapConfig,
    size: [i32; 3],
    tiles: Vec<Tile>,
    objects: BTreeMap<ObjectId, PlacedObject>,
}

impl Default for TileMap {
    fn default() -> Self {
        Self {
            config: TileMapConfig::default(),
            size: [0, 0, 0],
            tiles: Vec::new(),
            objects: BTreeMap::new(),
        }
    }
}

impl TileMap {
    pub fn new(config: TileMapConfig) -> BattleResult<Self> {
        config.validate()?;
        let [sx, sy, sz] = config.size;
        let mut tiles = Vec::with_capacity(config.tile_count());
        for z in 0..sz {
            for y in 0..sy {
                for x in 0..sx {
                    tiles.push(Tile::new(TileCoord::new(x, y, z), config.layer_count));
                }
            }
        }
        log::debug!("tile map {sx}×{sy}×{sz} created");
        Ok(Self {
            size: config.size,
            config,
            tiles,
            objects: BTreeMap::new(),
        })
    }

    pub fn config(&self) -> &TileMapConfig {
        &self.config
    }

    pub fn movement(&self) -> &MovementRules {
        &self.config.movement
    }

    pub fn size(&self) -> [i32; 3] {
        self.size
    }

    pub fn voxel_size(&self) -> [i32; 3] {
        self.config.voxel_size
    }

    // -----------------------------------------------------------------------
    // Tile access
    // -----------------------------------------------------------------------

    pub fn in_bounds(&self, coord: TileCoord) -> bool {
        coord.x >= 0
            && coord.y >= 0
            && coord.z >= 0
            && coord.x < self.size[0]
            && coord.y < self.size[1]
            && coord.z < self.size[2]
    }

    pub fn tile_index(&self, coord: TileCoord) -> Option<TileIndex> {
        if !self.in_bounds(coord) {
            return None;
        }
        let [sx, sy, _] = self.size;
        Some(TileIndex((coord.z * sy * sx + coord.y * sx + coord.x) as u32))
    }

    pub fn coord_of(&self, index: TileIndex) -> Option<TileCoord> {
        self.tiles.get(index.0 as usize).map(Tile::position)
    }

    pub fn tile(&self, coord: TileCoord) -> Option<&Tile> {
        self.tile_index(coord)
            .and_then(|i| self.tiles.get(i.0 as usize))
    }

    /// Like `tile`, but reports out-of-grid coordinates as an error.
    pub fn try_tile(&self, coord: TileCoord) -> BattleResult<&Tile> {
        self.tile(coord).ok_or(BattleError::OutOfBounds { coord })
    }

    fn tile_mut(&mut self, coord: TileCoord) -> Option<&mut Tile> {
        let i = self.tile_index(coord)?;
        self.tiles.get_mut(i.0 as usize)
    }

    pub fn tiles(&self) -> impl Iterator<Item = &Tile> {
        self.tiles.iter()
    }

    /// Draw layer for `kind`. Configs are validated at construction, so the
    /// fallback only applies to the zero-sized default map.
    pub fn layer_for(&self, kind: ObjectKind) -> usize {
        self.config.layer_map.get(&kind).copied().unwrap_or(0)
    }

    // -----------------------------------------------------------------------
    // Object queries
    // -----------------------------------------------------------------------

    pub fn object(&self, id: ObjectId) -> Option<&PlacedObject> {
        self.objects.get(&id)
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.objects.contains_key(&id)
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    pub fn objects(&self) -> impl Iterator<Item = &PlacedObject> {
        self.objects.values()
    }

    /// Owning tile of a placed object.
    pub fn owner_of(&self, id: ObjectId) -> Option<TileCoord> {
        self.objects
            .get(&id)
            .and_then(|o| o.owner)
            .and_then(|i| self.coord_of(i))
    }

    /// True if a unit other than `mover` overlaps `coord`.
    pub fn has_other_unit(&self, coord: TileCoord, mover: Option<ObjectId>) -> bool {
        self.tile(coord).is_some_and(|tile| {
            tile.intersecting().iter().any(|id| {
                Some(*id) != mover
                    && self
                        .objects
                        .get(id)
                        .is_some_and(|o| o.kind == ObjectKind::Unit)
            })
        })
    }

    // -----------------------------------------------------------------------
    // Footprints and resting positions
    // -----------------------------------------------------------------------

    /// Tiles a mover standing on `coord` occupies. Small movers occupy the
    /// tile itself. Large movers occupy `{x-1, x} × {y-1, y} × {z, z+1}`, so
    /// their anchor sits on the shared corner of the four columns.
    pub fn footprint(coord: TileCoord, large: bool) -> SmallVec<[TileCoord; 8]> {
        if !large {
            return smallvec::smallvec![coord];
        }
        let mut cells = SmallVec::new();
        for dz in 0..=1 {
            for dy in -1..=0 {
                for dx in -1..=0 {
                    cells.push(coord.offset(dx, dy, dz));
                }
            }
        }
        cells
    }

    /// The ground-level (first four, or only) cells of a footprint.
    pub fn base_footprint(coord: TileCoord, large: bool) -> SmallVec<[TileCoord; 8]> {
        Self::footprint(coord, large)
            .into_iter()
            .filter(|c| c.z == coord.z)
            .collect()
    }

    /// Whether a mover on `coord` has something to stand on.
    pub fn supports(&self, coord: TileCoord, large: bool) -> bool {
        Self::base_footprint(coord, large)
            .iter()
            .any(|&c| self.tile(c).is_some_and(Tile::can_stand))
    }

    /// Where a mover standing on `coord` puts its feet.
    pub fn resting_position(&self, coord: TileCoord, large: bool) -> WorldPos {
        let height = Self::base_footprint(coord, large)
            .iter()
            .filter_map(|&c| self.tile(c))
            .map(Tile::height)
            .fold(0.0f32, f32::max);
        if large {
            WorldPos::new(coord.x as f32, coord.y as f32, coord.z as f32 + height)
        } else {
            WorldPos::new(
                coord.x as f32 + 0.5,
                coord.y as f32 + 0.5,
                coord.z as f32 + height,
            )
        }
    }

    // -----------------------------------------------------------------------
    // Insert / remove / move
    // -----------------------------------------------------------------------

    /// Place `object` at its own position. Returns the owning tile, or `None`
    /// if it could not be placed.
    pub fn insert(&mut self, object: &impl TileObject) -> Option<TileCoord> {
        self.place(PlacedObject::from_object(object))
    }

    /// Place `object` at `position` instead of its own position.
    pub fn insert_at(&mut self, object: &impl TileObject, position: WorldPos) -> Option<TileCoord> {
        let mut placed = PlacedObject::from_object(object);
        placed.position = position;
        self.place(placed)
    }

    /// Remove an object. Removing something that is not placed is a no-op
    /// and returns false.
    pub fn remove(&mut self, id: ObjectId) -> bool {
        self.unregister(id).is_some()
    }

    /// Re-place an object at `position`. Always a full remove and insert so
    /// ownership, intersections, draw order, and caches are re-resolved.
    pub fn move_object(&mut self, id: ObjectId, position: WorldPos) -> Option<TileCoord> {
        let Some(mut placed) = self.unregister(id) else {
            log::warn!("move of {id}, which is not on the map");
            return None;
        };
        placed.position = position;
        self.place(placed)
    }

    fn place(&mut self, mut placed: PlacedObject) -> Option<TileCoord> {
        if !placed.position.is_finite() {
            log::error!(
                "{} ({:?}) has non-finite position {:?}; not placed",
                placed.id,
                placed.kind,
                placed.position
            );
            return None;
        }
        if self.tiles.is_empty() {
            log::error!("{} inserted into an empty map", placed.id);
            return None;
        }
        if self.objects.contains_key(&placed.id) {
            log::error!("{} inserted twice; replacing earlier placement", placed.id);
            self.unregister(placed.id);
        }

        let clamped = self.clamp(placed.position);
        if clamped != placed.position {
            log::warn!(
                "{} position {} outside map, clamped to {}",
                placed.id,
                placed.position,
                clamped
            );
            placed.position = clamped;
        }

        let owner_coord = placed.position.tile();
        let owner = self.tile_index(owner_coord)?;
        let (min, max) = placed.bounds();
        let mut intersecting: SmallVec<[TileIndex; 8]> = SmallVec::new();
        for z in self.span(min.z, max.z, 2) {
            for y in self.span(min.y, max.y, 1) {
                for x in self.span(min.x, max.x, 0) {
                    if let Some(i) = self.tile_index(TileCoord::new(x, y, z)) {
                        intersecting.push(i);
                    }
                }
            }
        }
        if !intersecting.contains(&owner) {
            intersecting.push(owner);
        }

        let layer = self.layer_for(placed.kind);
        let scale = self.config.draw_scale;
        self.tiles[owner.0 as usize].add_owned(&placed, layer, scale);
        for i in &intersecting {
            self.tiles[i.0 as usize].add_intersecting(placed.id);
        }
        placed.owner = Some(owner);
        placed.intersecting = intersecting;

        let structural = placed.kind.is_structural();
        log::trace!("{} placed at {}", placed.id, owner_coord);
        self.objects.insert(placed.id, placed);
        if structural {
            self.refresh_around(owner_coord);
        }
        Some(owner_coord)
    }

    fn unregister(&mut self, id: ObjectId) -> Option<PlacedObject> {
        let mut placed = self.objects.remove(&id)?;
        if let Some(owner) = placed.owner.take() {
            if !self.tiles[owner.0 as usize].remove_owned(id) {
                log::error!("{id} missing from its owning tile");
            }
        }
        for i in placed.intersecting.drain(..) {
            self.tiles[i.0 as usize].remove_intersecting(id);
        }
        if placed.kind.is_structural() {
            let coord = placed.position.tile();
            self.refresh_around(coord);
        }
        Some(placed)
    }

    fn clamp(&self, p: WorldPos) -> WorldPos {
        let limit = |v: f32, axis: usize| v.clamp(0.0, self.size[axis] as f32 - CLAMP_MARGIN);
        WorldPos::new(limit(p.x, 0), limit(p.y, 1), limit(p.z, 2))
    }

    /// Tiles overlapped by `[min, max]` on one axis, clipped to the map.
    fn span(&self, min: f32, max: f32, axis: usize) -> RangeInclusive<i32> {
        let top = self.size[axis] - 1;
        let lo = (min.floor() as i32).clamp(0, top);
        let hi = (max.ceil() as i32 - 1).clamp(lo, top);
        lo..=hi
    }

    // -----------------------------------------------------------------------
    // Cache maintenance
    // -----------------------------------------------------------------------

    /// Recompute `coord` and every neighbour whose cached fields read it.
    fn refresh_around(&mut self, coord: TileCoord) {
        if let Some(i) = self.tile_index(coord) {
            let objects = &self.objects;
            self.tiles[i.0 as usize].refresh_structure(objects);
        }
        self.refresh_faces(coord);
        self.refresh_faces(coord.offset(-1, 0, 0));
        self.refresh_faces(coord.offset(0, -1, 0));
        self.refresh_support(coord);
        self.refresh_support(coord.offset(0, 0, 1));
    }

    fn refresh_faces(&mut self, coord: TileCoord) {
        let east = self
            .tile(coord.offset(1, 0, 0))
            .map_or(0, Tile::left_wall_cost);
        let south = self
            .tile(coord.offset(0, 1, 0))
            .map_or(0, Tile::right_wall_cost);
        if let Some(tile) = self.tile_mut(coord) {
            tile.refresh_faces(east, south);
        }
    }

    fn refresh_support(&mut self, coord: TileCoord) {
        let below = self.tile(coord.offset(0, 0, -1)).map(Tile::height);
        if let Some(tile) = self.tile_mut(coord) {
            tile.refresh_support(below);
        }
    }
}
