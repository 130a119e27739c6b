// Per-mover traversal legality and cost.
//
// `TraversalPolicy` answers "can this mover step from tile A to adjacent
// tile B, and at what cost". Path search and the goto mission only ever go
// through this trait. `UnitTileHelper` is the policy for battle units; its
// rules, in evaluation order:
//
// 1. Same tile, non-adjacent tiles, out-of-grid tiles, and movers that
//    cannot move are rejected.
// 2. A non-flyer with nothing to stand on may always drop straight down,
//    at zero cost (a controlled fall).
// 3. Every body cell at the destination (one tile, or the 2×2×2 block of a
//    large mover) must be in the grid and below the impassable movement
//    cost. Large movers also need head clearance: no floor in their upper
//    cells. Optionally, cells holding other units are refused.
// 4. Non-flyers need a standable surface under the destination footprint.
// 5. Vertical moves: going straight up or down needs a lift pair (or
//    flight) and no floor in the way. Stepping up sideways needs the origin
//    surface to be high enough (flyers skip this) and no floor above the
//    origin; stepping down sideways needs the destination surface to be high
//    enough and no floor above the destination, or above the clipped cells
//    of a diagonal.
// 6. Walls: an orthogonal step pays the entered face; a diagonal step pays
//    the worst of the four faces around the corner it clips and is refused
//    if a clipped tile is impassable. Large movers pay for every column of
//    the footprint and for the walls inside the destination footprint.
//    Moves that change level are checked on both levels.
//
// Cost is `max(cost in, wall cost, base cost) × (0.5 per changed axis +
// 0.5) / cost scale`, so a plain orthogonal step costs one tile.
//
// See also: `pathfinding.rs` for the search driven by this policy,
// `tile.rs` for the cached fields read here, `config.rs` for
// `MovementRules`.

use crate::profile::UnitProfile;
use crate::tile::Tile;
use crate::tilemap::TileMap;
use crate::types::{ObjectId, Side, TileCoord};
use smallvec::SmallVec;

/// Legality and cost of single steps for one mover.
pub trait TraversalPolicy {
    /// Cost of stepping from `from` to `to` in tile units, or `None` if the
    /// step is not allowed.
    fn can_enter(&self, map: &TileMap, from: TileCoord, to: TileCoord) -> Option<f32>;

    /// Extra cost added by the search on top of `can_enter`, used to make
    /// some movers prefer or avoid altitude.
    fn altitude_adjustment(&self, _map: &TileMap, _from: TileCoord, _to: TileCoord) -> f32 {
        0.0
    }
}

/// What a mover's body can do.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MoverCapabilities {
    pub large: bool,
    pub can_fly: bool,
    /// False while the mover is downed or otherwise immobile.
    pub can_move: bool,
    /// The mover's own map object, ignored by unit avoidance.
    pub mover: Option<ObjectId>,
    /// Refuse tiles occupied by other units.
    pub avoid_units: bool,
}

impl MoverCapabilities {
    pub fn walker() -> Self {
        Self {
            large: false,
            can_fly: false,
            can_move: true,
            mover: None,
            avoid_units: false,
        }
    }

    pub fn from_profile(profile: &UnitProfile, mover: Option<ObjectId>) -> Self {
        Self {
            large: profile.large,
            can_fly: profile.can_fly,
            can_move: true,
            mover,
            avoid_units: false,
        }
    }
}

/// Traversal policy for battle units.
#[derive(Clone, Copy, Debug)]
pub struct UnitTileHelper {
    caps: MoverCapabilities,
}

impl UnitTileHelper {
    pub fn new(caps: MoverCapabilities) -> Self {
        Self { caps }
    }

    pub fn capabilities(&self) -> MoverCapabilities {
        self.caps
    }

    fn has_floor(map: &TileMap, c: TileCoord) -> bool {
        map.tile(c).is_some_and(Tile::solid_ground)
    }

    fn surface_height(map: &TileMap, at: TileCoord, large: bool) -> f32 {
        TileMap::base_footprint(at, large)
            .iter()
            .filter_map(|&c| map.tile(c))
            .map(Tile::height)
            .fold(0.0, f32::max)
    }

    /// Worst crossing cost of a planar step between two columns at level
    /// `z`. Diagonals clip two corner tiles; an impassable corner tile makes
    /// the step impassable.
    fn planar_wall_cost(map: &TileMap, from: TileCoord, to: TileCoord, z: i32, impassable: u8) -> u8 {
        let f = TileCoord::new(from.x, from.y, z);
        let t = TileCoord::new(to.x, to.y, z);
        let face = |a: TileCoord, b: TileCoord| -> u8 {
            match (Side::entered(a, b), map.tile(b)) {
                (Some(side), Some(tile)) => tile.face_cost(side),
                _ => 0,
            }
        };
        if f.x == t.x || f.y == t.y {
            return face(f, t);
        }
        let clip_a = TileCoord::new(t.x, f.y, z);
        let clip_b = TileCoord::new(f.x, t.y, z);
        let blocked = [clip_a, clip_b].iter().any(|&c| {
            map.tile(c)
                .is_some_and(|tile| tile.movement_cost_in() >= impassable)
        });
        if blocked {
            return impassable;
        }
        face(f, clip_a)
            .max(face(clip_a, t))
            .max(face(f, clip_b))
            .max(face(clip_b, t))
    }

    /// Walls a large mover would straddle when standing on `at`.
    fn interior_wall_cost(map: &TileMap, at: TileCoord, z: i32) -> u8 {
        let se = TileCoord::new(at.x, at.y, z);
        let ne = TileCoord::new(at.x, at.y - 1, z);
        let sw = TileCoord::new(at.x - 1, at.y, z);
        let cost = |c: TileCoord, side: Side| map.tile(c).map_or(0, |t| t.face_cost(side));
        cost(se, Side::West)
            .max(cost(ne, Side::West))
            .max(cost(se, Side::North))
            .max(cost(sw, Side::North))
    }

    /// Columns at `from.z` that a diagonal step sweeps through without
    /// belonging to either end of the step: the two corner tiles for a small
    /// mover, the two leading-edge corners of a large footprint.
    fn clipped_columns(from: TileCoord, to: TileCoord, large: bool) -> SmallVec<[TileCoord; 4]> {
        let (dx, dy) = (to.x - from.x, to.y - from.y);
        let start = TileMap::base_footprint(from, large);
        let end = TileMap::base_footprint(TileCoord::new(to.x, to.y, from.z), large);
        let mut clipped = SmallVec::new();
        for col in &start {
            for c in [col.offset(dx, 0, 0), col.offset(0, dy, 0)] {
                if !start.contains(&c) && !end.contains(&c) && !clipped.contains(&c) {
                    clipped.push(c);
                }
            }
        }
        clipped
    }

    fn wall_cost(&self, map: &TileMap, from: TileCoord, to: TileCoord) -> u8 {
        let impassable = map.movement().impassable_cost;
        if from.x == to.x && from.y == to.y {
            return 0;
        }
        let large = self.caps.large;
        let mut levels: SmallVec<[i32; 4]> = SmallVec::new();
        for z in [from.z, to.z] {
            levels.push(z);
            if large {
                levels.push(z + 1);
            }
        }
        levels.sort_unstable();
        levels.dedup();

        let (dx, dy) = (to.x - from.x, to.y - from.y);
        let mut worst = 0u8;
        for z in levels {
            let from_columns = TileMap::base_footprint(TileCoord::new(from.x, from.y, z), large);
            for col in from_columns {
                let cost = Self::planar_wall_cost(map, col, col.offset(dx, dy, 0), z, impassable);
                worst = worst.max(cost);
            }
            if large {
                worst = worst.max(Self::interior_wall_cost(map, to, z));
            }
        }
        worst
    }
}

impl TraversalPolicy for UnitTileHelper {
    fn can_enter(&self, map: &TileMap, from: TileCoord, to: TileCoord) -> Option<f32> {
        let caps = &self.caps;
        if from == to || !caps.can_move || !from.is_adjacent(to) {
            return None;
        }
        if !map.in_bounds(from) || !map.in_bounds(to) {
            return None;
        }
        let rules = map.movement();
        let large = caps.large;
        let (dx, dy, dz) = (to.x - from.x, to.y - from.y, to.z - from.z);
        let vertical_only = dx == 0 && dy == 0;

        if vertical_only && dz == -1 && !caps.can_fly && !map.supports(from, large) {
            return Some(0.0);
        }

        // Body cells at the destination.
        let body = TileMap::footprint(to, large);
        let mut cost_in = 0u8;
        for &cell in &body {
            let tile = map.tile(cell)?;
            cost_in = cost_in.max(tile.movement_cost_in());
            if caps.avoid_units && map.has_other_unit(cell, caps.mover) {
                return None;
            }
        }
        if cost_in >= rules.impassable_cost {
            return None;
        }
        if large
            && body
                .iter()
                .any(|&c| c.z > to.z && Self::has_floor(map, c))
        {
            return None;
        }

        if !caps.can_fly && !map.supports(to, large) {
            return None;
        }

        // Level changes.
        let lift_pair = {
            let lift = |c: TileCoord| map.tile(c).is_some_and(Tile::has_lift);
            lift(from) && lift(to)
        };
        let to_base = TileMap::base_footprint(to, large);
        let from_base = TileMap::base_footprint(from, large);
        match dz {
            1 if vertical_only => {
                if !lift_pair && !caps.can_fly {
                    return None;
                }
                if !lift_pair && to_base.iter().any(|&c| Self::has_floor(map, c)) {
                    return None;
                }
            }
            1 => {
                if !caps.can_fly
                    && Self::surface_height(map, from, large) < rules.ascend_height_threshold
                {
                    return None;
                }
                if !large && Self::has_floor(map, from.offset(0, 0, 1)) {
                    return None;
                }
            }
            -1 if vertical_only => {
                if !lift_pair && !caps.can_fly {
                    return None;
                }
                if !lift_pair && from_base.iter().any(|&c| Self::has_floor(map, c)) {
                    return None;
                }
            }
            -1 => {
                if !caps.can_fly
                    && Self::surface_height(map, to, large) < rules.ascend_height_threshold
                {
                    return None;
                }
                // Large bodies already cleared the level above `to` as part
                // of their footprint.
                let mut above: SmallVec<[TileCoord; 8]> = SmallVec::new();
                if !large {
                    above.push(to.offset(0, 0, 1));
                }
                if dx != 0 && dy != 0 {
                    above.extend(Self::clipped_columns(from, to, large));
                }
                if above.iter().any(|&c| Self::has_floor(map, c)) {
                    return None;
                }
            }
            _ => {}
        }

        let walls = self.wall_cost(map, from, to);
        if walls >= rules.impassable_cost {
            return None;
        }

        let raw = cost_in.max(walls).max(rules.base_move_cost) as f32;
        let multiplier = 0.5 * (from.axes_changed(to) as f32 + 1.0);
        Some(raw * multiplier / rules.cost_scale)
    }

    fn altitude_adjustment(&self, map: &TileMap, _from: TileCoord, to: TileCoord) -> f32 {
        if self.caps.can_fly && !map.supports(to, self.caps.large) {
            map.movement().unsupported_flight_penalty
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map_part::MapPartType;
    use crate::testutil::{MapBuilder, VOXELS};

    fn walker() -> UnitTileHelper {
        UnitTileHelper::new(MoverCapabilities::walker())
    }

    fn large_walker() -> UnitTileHelper {
        UnitTileHelper::new(MoverCapabilities {
            large: true,
            ..MoverCapabilities::walker()
        })
    }

    fn flyer() -> UnitTileHelper {
        UnitTileHelper::new(MoverCapabilities {
            can_fly: true,
            ..MoverCapabilities::walker()
        })
    }

    fn t(x: i32, y: i32, z: i32) -> TileCoord {
        TileCoord::new(x, y, z)
    }

    #[test]
    fn basic_rejections() {
        let b = MapBuilder::floored(4, 4, 2);
        let w = walker();
        assert!(w.can_enter(&b.map, t(1, 1, 0), t(1, 1, 0)).is_none());
        assert!(w.can_enter(&b.map, t(1, 1, 0), t(3, 1, 0)).is_none());
        assert!(w.can_enter(&b.map, t(3, 1, 0), t(4, 1, 0)).is_none());
        let stuck = UnitTileHelper::new(MoverCapabilities {
            can_move: false,
            ..MoverCapabilities::walker()
        });
        assert!(stuck.can_enter(&b.map, t(1, 1, 0), t(2, 1, 0)).is_none());
    }

    #[test]
    fn step_costs_scale_with_axes() {
        let b = MapBuilder::floored(4, 4, 2);
        let w = walker();
        assert_eq!(w.can_enter(&b.map, t(1, 1, 0), t(2, 1, 0)), Some(1.0));
        assert_eq!(w.can_enter(&b.map, t(1, 1, 0), t(2, 2, 0)), Some(1.5));
        let f = flyer();
        assert_eq!(f.can_enter(&b.map, t(1, 1, 0), t(2, 2, 1)), Some(2.0));
    }

    #[test]
    fn walkers_need_ground() {
        let b = MapBuilder::new(4, 4, 2);
        assert!(walker().can_enter(&b.map, t(1, 1, 0), t(2, 1, 0)).is_none());
        assert!(flyer().can_enter(&b.map, t(1, 1, 0), t(2, 1, 0)).is_some());
    }

    #[test]
    fn unsupported_walker_falls_for_free() {
        let b = MapBuilder::floored(4, 4, 3);
        let w = walker();
        assert_eq!(w.can_enter(&b.map, t(1, 1, 2), t(1, 1, 1)), Some(0.0));
        // Standing on a floor, a walker cannot drop through it.
        let mut b = b;
        b.floor_level(2);
        assert!(w.can_enter(&b.map, t(1, 1, 2), t(1, 1, 1)).is_none());
    }

    #[test]
    fn impassable_tile_and_walls() {
        let mut b = MapBuilder::floored(5, 5, 2);
        b.lay(&MapPartType::solid_block(VOXELS), t(2, 2, 0));
        b.lay(&MapPartType::left_wall(VOXELS), t(3, 1, 0));
        let w = walker();
        assert!(w.can_enter(&b.map, t(1, 2, 0), t(2, 2, 0)).is_none());
        // West face of (3,1) blocks both directions.
        assert!(w.can_enter(&b.map, t(2, 1, 0), t(3, 1, 0)).is_none());
        assert!(w.can_enter(&b.map, t(3, 1, 0), t(2, 1, 0)).is_none());
        // Diagonal past an impassable tile is refused.
        assert!(w.can_enter(&b.map, t(3, 2, 0), t(2, 3, 0)).is_none());
        assert!(w.can_enter(&b.map, t(1, 2, 0), t(2, 3, 0)).is_none());
        // Diagonal past the wall's corner is refused too.
        assert!(w.can_enter(&b.map, t(2, 0, 0), t(3, 1, 0)).is_none());
    }

    #[test]
    fn crossable_wall_raises_cost() {
        let mut b = MapBuilder::floored(4, 4, 2);
        b.lay(&MapPartType::left_wall(VOXELS).with_movement_cost(12), t(2, 1, 0));
        assert_eq!(walker().can_enter(&b.map, t(1, 1, 0), t(2, 1, 0)), Some(3.0));
        assert_eq!(walker().can_enter(&b.map, t(1, 2, 0), t(2, 2, 0)), Some(1.0));
    }

    #[test]
    fn stairs_allow_climbing_one_level() {
        let mut b = MapBuilder::floored(4, 4, 3);
        b.lay(&MapPartType::stairs(VOXELS, 0.75), t(1, 1, 0));
        b.lay(&MapPartType::floor(VOXELS), t(2, 1, 1));
        let w = walker();
        // Flat floor is too low to step up from.
        assert!(w.can_enter(&b.map, t(2, 2, 0), t(2, 1, 1)).is_none());
        assert!(w.can_enter(&b.map, t(1, 1, 0), t(2, 1, 1)).is_some());
        assert!(w.can_enter(&b.map, t(2, 1, 1), t(1, 1, 0)).is_some());
        // Straight up needs a lift.
        assert!(w.can_enter(&b.map, t(2, 1, 0), t(2, 1, 1)).is_none());
    }

    #[test]
    fn diagonal_descent_blocked_by_floor_in_corner_tile() {
        let mut b = MapBuilder::floored(4, 4, 3);
        b.lay(&MapPartType::stairs(VOXELS, 0.75), t(1, 1, 0));
        b.lay(&MapPartType::floor(VOXELS), t(2, 2, 1));
        let w = walker();
        assert!(w.can_enter(&b.map, t(2, 2, 1), t(1, 1, 0)).is_some());

        b.lay(&MapPartType::floor(VOXELS), t(2, 1, 1));
        assert!(w.can_enter(&b.map, t(2, 2, 1), t(1, 1, 0)).is_none());
    }

    #[test]
    fn large_diagonal_descent_checks_leading_corners() {
        let mut b = MapBuilder::floored(6, 6, 3);
        b.lay(&MapPartType::stairs(VOXELS, 0.75), t(2, 2, 0));
        for c in [t(3, 3, 1), t(2, 3, 1), t(3, 2, 1)] {
            b.lay(&MapPartType::floor(VOXELS), c);
        }
        let large = large_walker();
        assert!(large.can_enter(&b.map, t(3, 3, 1), t(2, 2, 0)).is_some());

        b.lay(&MapPartType::floor(VOXELS), t(3, 1, 1));
        assert!(large.can_enter(&b.map, t(3, 3, 1), t(2, 2, 0)).is_none());
    }

    #[test]
    fn clipped_columns_of_diagonal_steps() {
        let small = UnitTileHelper::clipped_columns(t(2, 2, 1), t(1, 1, 0), false);
        assert_eq!(small.as_slice(), &[t(1, 2, 1), t(2, 1, 1)]);
        let large = UnitTileHelper::clipped_columns(t(3, 3, 1), t(2, 2, 0), true);
        assert_eq!(large.len(), 2);
        assert!(large.contains(&t(1, 3, 1)) && large.contains(&t(3, 1, 1)));
    }

    #[test]
    fn lifts_carry_walkers_vertically() {
        let mut b = MapBuilder::floored(3, 3, 3);
        for z in 0..3 {
            b.lay(&MapPartType::lift(), t(1, 1, z));
        }
        b.lay(&MapPartType::floor(VOXELS), t(1, 1, 2));
        let w = walker();
        assert!(w.can_enter(&b.map, t(1, 1, 0), t(1, 1, 1)).is_some());
        assert!(w.can_enter(&b.map, t(1, 1, 1), t(1, 1, 2)).is_some());
        assert!(w.can_enter(&b.map, t(1, 1, 2), t(1, 1, 1)).is_some());
        // No lift, no vertical move.
        assert!(w.can_enter(&b.map, t(0, 0, 0), t(0, 0, 1)).is_none());
    }

    #[test]
    fn flyers_cannot_pass_floors_vertically() {
        let mut b = MapBuilder::floored(3, 3, 3);
        b.floor_level(1);
        let f = flyer();
        assert!(f.can_enter(&b.map, t(1, 1, 0), t(1, 1, 1)).is_none());
        assert!(f.can_enter(&b.map, t(1, 1, 1), t(1, 1, 0)).is_none());
        assert!(f.can_enter(&b.map, t(1, 1, 1), t(1, 1, 2)).is_some());
    }

    #[test]
    fn large_unit_needs_head_clearance() {
        let mut b = MapBuilder::floored(10, 10, 3);
        b.lay(&MapPartType::floor(VOXELS), t(5, 5, 1));
        assert!(walker().can_enter(&b.map, t(6, 6, 0), t(5, 5, 0)).is_some());
        assert!(large_walker().can_enter(&b.map, t(7, 7, 0), t(6, 6, 0)).is_none());
        assert!(large_walker().can_enter(&b.map, t(3, 3, 0), t(3, 4, 0)).is_some());
    }

    #[test]
    fn large_footprint_rejects_single_impassable_cell() {
        let mut b = MapBuilder::floored(10, 10, 3);
        b.lay(&MapPartType::solid_block(VOXELS), t(4, 4, 0));
        let big = large_walker();
        // Footprint of (5,5,0) is {4,5}×{4,5}; only (4,4,0) is blocked.
        assert!(big.can_enter(&b.map, t(6, 5, 0), t(5, 5, 0)).is_none());
        assert!(walker().can_enter(&b.map, t(6, 5, 0), t(5, 5, 0)).is_some());
        assert!(big.can_enter(&b.map, t(6, 6, 0), t(6, 5, 0)).is_some());
    }

    #[test]
    fn large_unit_cannot_straddle_a_wall() {
        let mut b = MapBuilder::floored(10, 10, 3);
        b.lay(&MapPartType::left_wall(VOXELS), t(5, 2, 0));
        let big = large_walker();
        // Standing on (5,3,0) would put the wall at x=5 between its columns.
        assert!(big.can_enter(&b.map, t(5, 4, 0), t(5, 3, 0)).is_none());
        assert!(big.can_enter(&b.map, t(5, 5, 0), t(5, 4, 0)).is_some());
    }

    #[test]
    fn avoidance_refuses_occupied_tiles() {
        use crate::object::TileObject;
        use crate::types::{Extent, ObjectKind, WorldPos};

        struct Body;
        impl TileObject for Body {
            fn object_id(&self) -> ObjectId {
                ObjectId(1)
            }
            fn kind(&self) -> ObjectKind {
                ObjectKind::Unit
            }
            fn position(&self) -> WorldPos {
                WorldPos::new(2.5, 1.5, 0.0)
            }
            fn extent(&self) -> Extent {
                Extent::new(0.5, 0.5, 0.9)
            }
        }

        let mut b = MapBuilder::floored(4, 4, 2);
        b.map.insert(&Body);
        let polite = UnitTileHelper::new(MoverCapabilities {
            avoid_units: true,
            mover: Some(ObjectId(2)),
            ..MoverCapabilities::walker()
        });
        assert!(polite.can_enter(&b.map, t(1, 1, 0), t(2, 1, 0)).is_none());
        assert!(walker().can_enter(&b.map, t(1, 1, 0), t(2, 1, 0)).is_some());
        let itself = UnitTileHelper::new(MoverCapabilities {
            avoid_units: true,
            mover: Some(ObjectId(1)),
            ..MoverCapabilities::walker()
        });
        assert!(itself.can_enter(&b.map, t(1, 1, 0), t(2, 1, 0)).is_some());
    }

    #[test]
    fn flyers_pay_to_leave_the_ground() {
        let b = MapBuilder::floored(4, 4, 3);
        let f = flyer();
        assert_eq!(f.altitude_adjustment(&b.map, t(1, 1, 0), t(1, 1, 1)), 0.25);
        assert_eq!(f.altitude_adjustment(&b.map, t(1, 1, 1), t(1, 1, 0)), 0.0);
        assert_eq!(walker().altitude_adjustment(&b.map, t(1, 1, 0), t(2, 1, 0)), 0.0);
    }
}
