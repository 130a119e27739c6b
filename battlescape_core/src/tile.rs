// One cell of the tile map.
//
// A `Tile` holds the objects it owns (anchor inside the tile), the objects
// whose bounds merely intersect it, one depth-sorted draw list per layer, and
// cached traversal fields derived from the structural objects it owns:
// surface height, solid ground, can-stand, lift, movement cost in, its own
// wall costs, and the crossing cost of each of its four side faces.
//
// Caches are filled by `TileMap` inside every structural mutation, so they
// are always consistent with the owned set when a map call returns. Fields
// that depend on neighbours (face costs read the east/south tiles' walls,
// can-stand reads the tile below) are pushed in by the map.
//
// See also: `tilemap.rs` for the recompute order, `passability.rs` for the
// consumer of the cached fields.

use crate::object::PlacedObject;
use crate::types::{ObjectId, ObjectKind, Side, TileCoord};
use std::collections::{BTreeMap, BTreeSet};

/// One entry of a per-layer draw list.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DrawEntry {
    pub object: ObjectId,
    pub depth: f32,
    /// Tie-break at equal depth: ground, walls, everything else.
    pub rank: u8,
}

#[derive(Clone, Debug)]
pub struct Tile {
    position: TileCoord,
    owned: BTreeSet<ObjectId>,
    intersecting: BTreeSet<ObjectId>,
    draw_lists: Vec<Vec<DrawEntry>>,

    height: f32,
    solid_ground: bool,
    can_stand: bool,
    has_lift: bool,
    movement_cost_in: u8,
    left_wall_cost: u8,
    right_wall_cost: u8,
    face_costs: [u8; 4],
}

impl Tile {
    pub(crate) fn new(position: TileCoord, layer_count: usize) -> Self {
        Self {
            position,
            owned: BTreeSet::new(),
            intersecting: BTreeSet::new(),
            draw_lists: vec![Vec::new(); layer_count],
            height: 0.0,
            solid_ground: false,
            can_stand: false,
            has_lift: false,
            movement_cost_in: 0,
            left_wall_cost: 0,
            right_wall_cost: 0,
            face_costs: [0; 4],
        }
    }

    pub fn position(&self) -> TileCoord {
        self.position
    }

    pub fn owned(&self) -> &BTreeSet<ObjectId> {
        &self.owned
    }

    pub fn intersecting(&self) -> &BTreeSet<ObjectId> {
        &self.intersecting
    }

    /// Objects owned by this tile on `layer`, back to front.
    pub fn draw_list(&self, layer: usize) -> &[DrawEntry] {
        self.draw_lists.get(layer).map_or(&[], Vec::as_slice)
    }

    pub fn height(&self) -> f32 {
        self.height
    }

    pub fn solid_ground(&self) -> bool {
        self.solid_ground
    }

    /// A unit can stand here: the tile has a floor or a lift, or the tile
    /// below is filled to the top.
    pub fn can_stand(&self) -> bool {
        self.can_stand
    }

    pub fn has_lift(&self) -> bool {
        self.has_lift
    }

    pub fn movement_cost_in(&self) -> u8 {
        self.movement_cost_in
    }

    pub fn left_wall_cost(&self) -> u8 {
        self.left_wall_cost
    }

    pub fn right_wall_cost(&self) -> u8 {
        self.right_wall_cost
    }

    /// Cost of crossing `side` into this tile.
    pub fn face_cost(&self, side: Side) -> u8 {
        self.face_costs[side.index()]
    }

    // -----------------------------------------------------------------------
    // Mutation (map only)
    // -----------------------------------------------------------------------

    pub(crate) fn add_owned(&mut self, object: &PlacedObject, layer: usize, scale: [f32; 3]) {
        if !self.owned.insert(object.id) {
            log::error!("{} already owned by tile {}", object.id, self.position);
        }
        let Some(list) = self.draw_lists.get_mut(layer) else {
            log::error!("layer {layer} missing on tile {}", self.position);
            return;
        };
        list.retain(|e| e.object != object.id);
        list.push(DrawEntry {
            object: object.id,
            depth: object.depth(scale),
            rank: object.kind.draw_rank(),
        });
        list.sort_by(|a, b| {
            a.depth
                .total_cmp(&b.depth)
                .then(a.rank.cmp(&b.rank))
                .then(a.object.cmp(&b.object))
        });
    }

    pub(crate) fn remove_owned(&mut self, id: ObjectId) -> bool {
        for list in &mut self.draw_lists {
            list.retain(|e| e.object != id);
        }
        self.owned.remove(&id)
    }

    pub(crate) fn add_intersecting(&mut self, id: ObjectId) {
        self.intersecting.insert(id);
    }

    pub(crate) fn remove_intersecting(&mut self, id: ObjectId) {
        self.intersecting.remove(&id);
    }

    /// Recompute the fields derived from this tile's own structural objects.
    pub(crate) fn refresh_structure(&mut self, objects: &BTreeMap<ObjectId, PlacedObject>) {
        let mut height = 0.0f32;
        let mut solid_ground = false;
        let mut has_lift = false;
        let mut cost_in = 0u8;
        let mut left = 0u8;
        let mut right = 0u8;

        for id in &self.owned {
            let Some(object) = objects.get(id) else {
                log::error!("tile {} owns unknown {id}", self.position);
                continue;
            };
            let Some(props) = object.structure else {
                continue;
            };
            match object.kind {
                ObjectKind::Ground | ObjectKind::Feature => {
                    cost_in = cost_in.max(props.movement_cost);
                    height = height.max(props.height.clamp(0.0, 1.0));
                    solid_ground |= props.floor;
                    has_lift |= props.lift;
                }
                ObjectKind::LeftWall => left = left.max(props.movement_cost),
                ObjectKind::RightWall => right = right.max(props.movement_cost),
                _ => {}
            }
        }

        self.height = height;
        self.solid_ground = solid_ground;
        self.has_lift = has_lift;
        self.movement_cost_in = cost_in;
        self.left_wall_cost = left;
        self.right_wall_cost = right;
    }

    /// `below_height` is the height of the tile underneath, `None` at z = 0.
    pub(crate) fn refresh_support(&mut self, below_height: Option<f32>) {
        self.can_stand = self.solid_ground || self.has_lift || below_height.is_some_and(|h| h >= 1.0);
    }

    /// West and north faces carry this tile's own walls; east and south
    /// carry the neighbours'.
    pub(crate) fn refresh_faces(&mut self, east_left_wall: u8, south_right_wall: u8) {
        self.face_costs[Side::West.index()] = self.left_wall_cost;
        self.face_costs[Side::North.index()] = self.right_wall_cost;
        self.face_costs[Side::East.index()] = east_left_wall;
        self.face_costs[Side::South.index()] = south_right_wall;
    }
}
