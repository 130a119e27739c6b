// Projectiles: shots in flight.
//
// A projectile moves in a straight line at constant velocity. Each update
// sweeps the segment it covers with `ray_collision`, ignoring its shooter,
// and reports the first solid voxel hit. A projectile that leaves the map or
// outlives its range expires.
//
// See also: `collision.rs` for the voxel walk, `battle.rs` for how impacts
// are applied.

use crate::collision::Collision;
use crate::object::TileObject;
use crate::tilemap::TileMap;
use crate::types::*;
use serde::{Deserialize, Serialize};

const PROJECTILE_EXTENT: Extent = Extent::new(0.1, 0.1, 0.1);

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Projectile {
    pub id: ProjectileId,
    pub object: ObjectId,
    /// Object that fired the shot, never hit by it.
    pub shooter: Option<ObjectId>,
    pub position: WorldPos,
    /// Tiles per tick.
    pub velocity: WorldPos,
    /// Ticks of flight left before the shot expires.
    pub remaining: u32,
    pub damage: u32,
}

/// Result of advancing a projectile.
#[derive(Clone, Debug, PartialEq)]
pub enum ProjectileOutcome {
    InFlight,
    Impact(Collision),
    Expired,
}

/// Object kinds a shot can hit.
pub fn hittable() -> ObjectKindSet {
    ObjectKindSet::all()
        .without(ObjectKind::Projectile)
        .without(ObjectKind::Effect)
}

impl Projectile {
    pub fn update(&mut self, map: &mut TileMap, ticks: u32) -> ProjectileOutcome {
        let steps = ticks.min(self.remaining);
        let next = self.position + self.velocity * steps as f32;
        if let Some(hit) = map.ray_collision(self.position, next, hittable(), self.shooter) {
            self.position = hit.position;
            return ProjectileOutcome::Impact(hit);
        }
        self.remaining -= steps;
        if self.remaining == 0 || !map.in_bounds(next.tile()) {
            return ProjectileOutcome::Expired;
        }
        self.position = next;
        if map.move_object(self.object, next).is_none() {
            log::debug!("{}: map did not accept position {next}", self.id);
        }
        ProjectileOutcome::InFlight
    }
}

impl TileObject for Projectile {
    fn object_id(&self) -> ObjectId {
        self.object
    }

    fn kind(&self) -> ObjectKind {
        ObjectKind::Projectile
    }

    fn position(&self) -> WorldPos {
        self.position
    }

    fn extent(&self) -> Extent {
        PROJECTILE_EXTENT
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map_part::MapPartType;
    use crate::testutil::{MapBuilder, VOXELS};

    fn shot(from: WorldPos, velocity: WorldPos, remaining: u32) -> Projectile {
        Projectile {
            id: ProjectileId(1),
            object: ObjectId(1),
            shooter: None,
            position: from,
            velocity,
            remaining,
            damage: 10,
        }
    }

    #[test]
    fn shot_hits_wall_in_its_path() {
        let mut b = MapBuilder::floored(8, 3, 2);
        let wall = b.lay(&MapPartType::left_wall(VOXELS), TileCoord::new(4, 1, 0));
        let mut p = shot(WorldPos::new(0.5, 1.5, 0.5), WorldPos::new(1.0, 0.0, 0.0), 20);
        b.map.insert(&p);
        let mut outcome = ProjectileOutcome::InFlight;
        for _ in 0..20 {
            outcome = p.update(&mut b.map, 1);
            if outcome != ProjectileOutcome::InFlight {
                break;
            }
        }
        let ProjectileOutcome::Impact(hit) = outcome else {
            panic!("expected impact, got {outcome:?}");
        };
        assert_eq!(hit.object, wall);
        assert_eq!(hit.kind, ObjectKind::LeftWall);
        assert_eq!(hit.tile, TileCoord::new(4, 1, 0));
    }

    #[test]
    fn shot_expires_after_range() {
        let mut b = MapBuilder::floored(20, 3, 2);
        let mut p = shot(WorldPos::new(0.5, 1.5, 0.5), WorldPos::new(0.5, 0.0, 0.0), 4);
        b.map.insert(&p);
        let outcomes: Vec<_> = (0..4).map(|_| p.update(&mut b.map, 1)).collect();
        assert!(outcomes[..3].iter().all(|o| *o == ProjectileOutcome::InFlight));
        assert_eq!(outcomes[3], ProjectileOutcome::Expired);
    }

    #[test]
    fn shot_expires_leaving_map() {
        let mut b = MapBuilder::floored(3, 3, 2);
        let mut p = shot(WorldPos::new(1.5, 1.5, 0.5), WorldPos::new(0.0, 0.0, 1.0), 20);
        b.map.insert(&p);
        assert_eq!(p.update(&mut b.map, 1), ProjectileOutcome::InFlight);
        assert_eq!(p.update(&mut b.map, 1), ProjectileOutcome::Expired);
    }

    #[test]
    fn shooter_is_not_hit() {
        let mut b = MapBuilder::floored(8, 3, 2);
        let block = b.lay(&MapPartType::solid_block(VOXELS), TileCoord::new(1, 1, 0));
        let mut p = shot(WorldPos::new(1.5, 1.5, 0.5), WorldPos::new(1.0, 0.0, 0.0), 3);
        p.shooter = Some(block);
        b.map.insert(&p);
        assert_eq!(p.update(&mut b.map, 1), ProjectileOutcome::InFlight);
    }
}
