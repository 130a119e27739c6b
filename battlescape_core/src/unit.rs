// Battle units and the mission driver.
//
// A `BattleUnit` is one soldier or alien on the battlescape. All behaviour
// differences between archetypes come from the `UnitProfile` copied in at
// spawn time (see `profile.rs`). Units are `TileObject`s of kind `Unit`,
// anchored at the foot: small units stand at the centre of their tile, large
// units on the shared corner of their 2×2 footprint.
//
// `update_missions` drives the per-unit mission queue:
// - the front mission is popped out of the queue while it runs, so the
//   mission and the unit can both be borrowed mutably;
// - missions are started when they first reach the front;
// - finished missions are dropped, and a finished `RestartNextMission`
//   marks the next mission as not started;
// - at most one mission is updated per call, and a fixed step budget
//   (`MissionRules::max_steps_per_update`) bounds missions that finish as
//   soon as they start;
// - prerequisites are pushed in front of their parent with depth + 1. A
//   prerequisite deeper than `max_prerequisite_depth` is logged and dropped
//   together with its parent.
//
// In-flight movement is stored on the unit (`Movement`), not on a mission,
// so cancelling the queue can let a half-finished step settle.
//
// See also: `mission.rs` for the mission semantics, `battle.rs` for the
// tick loop that calls `update_missions`.
//
// **Critical constraint: determinism.** Units are updated in `UnitId` order
// by `Battle`; nothing here iterates a hash map.

use crate::event::BattleEventKind;
use crate::mission::{Mission, MissionContext, MissionKind, MissionStep};
use crate::object::TileObject;
use crate::passability::{MoverCapabilities, UnitTileHelper};
use crate::profile::UnitProfile;
use crate::tilemap::TileMap;
use crate::types::*;
use crate::voxel::{VoxelBody, VoxelVolume};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;

/// A step between two positions, advanced tick by tick.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Movement {
    pub from: WorldPos,
    pub to: WorldPos,
    /// Tile the unit will stand on when the step completes.
    pub destination: TileCoord,
    pub elapsed: u32,
    pub duration: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BattleUnit {
    pub id: UnitId,
    pub object: ObjectId,
    pub archetype: Archetype,
    pub profile: UnitProfile,
    pub position: WorldPos,
    pub facing: Facing,
    pub body_state: BodyState,
    pub health: u32,
    pub time_units: u32,
    pub movement: Option<Movement>,
    pub falling: bool,
    pub missions: VecDeque<Mission>,
    /// Collision body, derived from the profile.
    #[serde(skip)]
    body: Option<Arc<VoxelBody>>,
}

impl BattleUnit {
    pub fn new(
        id: UnitId,
        object: ObjectId,
        archetype: Archetype,
        profile: UnitProfile,
        position: WorldPos,
        voxel_size: [i32; 3],
    ) -> Self {
        let mut unit = Self {
            id,
            object,
            archetype,
            health: profile.max_health,
            time_units: profile.max_time_units,
            profile,
            position,
            facing: Facing::South,
            body_state: BodyState::Standing,
            movement: None,
            falling: false,
            missions: VecDeque::new(),
            body: None,
        };
        unit.rebuild_body(voxel_size);
        unit
    }

    /// Rebuild the collision body from the profile (after load).
    pub fn rebuild_body(&mut self, voxel_size: [i32; 3]) {
        let e = self.profile.extent;
        let size = [
            (e.x * voxel_size[0] as f32).ceil() as i32,
            (e.y * voxel_size[1] as f32).ceil() as i32,
            (e.z * voxel_size[2] as f32).ceil() as i32,
        ]
        .map(|n| n.max(1));
        let segment = Arc::new(VoxelVolume::solid(size));
        let body = if self.profile.large {
            VoxelBody::stacked([2, 2, 2], vec![Some(segment); 8])
        } else {
            VoxelBody::single(segment)
        };
        self.body = Some(Arc::new(body));
    }

    pub fn tile(&self) -> TileCoord {
        self.position.tile()
    }

    pub fn is_dead(&self) -> bool {
        self.health == 0 || self.body_state == BodyState::Downed
    }

    /// The traversal policy this unit plans and validates steps with.
    pub fn policy(&self) -> UnitTileHelper {
        UnitTileHelper::new(MoverCapabilities {
            can_move: !self.is_dead(),
            avoid_units: true,
            ..MoverCapabilities::from_profile(&self.profile, Some(self.object))
        })
    }

    pub fn resting_position(&self, map: &TileMap) -> WorldPos {
        map.resting_position(self.tile(), self.profile.large)
    }

    /// Tiles to walk from the current tile toward `target`, excluding the
    /// current tile. A partial route if the target cannot be reached.
    pub fn plan_route(&self, map: &TileMap, target: TileCoord, limit: u32) -> VecDeque<TileCoord> {
        let result = map.find_path(self.tile(), target, &self.policy(), limit);
        if !result.reached {
            log::debug!(
                "{}: no complete route {} → {target} ({} iterations); taking partial route",
                self.id,
                self.tile(),
                result.iterations
            );
        }
        result.tiles.into_iter().skip(1).collect()
    }

    pub fn take_damage(&mut self, amount: u32) -> bool {
        if self.is_dead() {
            return false;
        }
        self.health = self.health.saturating_sub(amount);
        if self.health == 0 {
            self.body_state = BodyState::Downed;
            self.missions.clear();
            self.movement = None;
            self.falling = false;
            return true;
        }
        false
    }

    // -----------------------------------------------------------------------
    // Movement
    // -----------------------------------------------------------------------

    pub fn begin_movement(&mut self, to: WorldPos, destination: TileCoord, duration: u32) {
        self.movement = Some(Movement {
            from: self.position,
            to,
            destination,
            elapsed: 0,
            duration: duration.max(1),
        });
    }

    /// Move the unit and its map object.
    pub fn set_position(&mut self, map: &mut TileMap, position: WorldPos) {
        self.position = position;
        if map.move_object(self.object, position).is_none() {
            log::debug!("{}: map did not accept position {position}", self.id);
        }
    }

    /// Advance the current step. Returns true if a step completed.
    pub fn advance_movement(&mut self, ctx: &mut MissionContext, ticks: u32) -> bool {
        let Some(mv) = self.movement.as_mut() else {
            return false;
        };
        mv.elapsed = mv.elapsed.saturating_add(ticks);
        if mv.elapsed >= mv.duration {
            let (to, destination) = (mv.to, mv.destination);
            self.movement = None;
            self.set_position(ctx.map, to);
            ctx.emit(BattleEventKind::UnitStepped {
                unit: self.id,
                tile: destination,
            });
            true
        } else {
            let p = mv.from.lerp(mv.to, mv.elapsed as f32 / mv.duration as f32);
            self.set_position(ctx.map, p);
            false
        }
    }

    // -----------------------------------------------------------------------
    // Mission queue
    // -----------------------------------------------------------------------

    pub fn queue_mission(&mut self, mission: Mission) {
        self.missions.push_back(mission);
    }

    /// Whether the front mission is of the given kind.
    pub fn current_mission_is(&self, f: impl Fn(&MissionKind) -> bool) -> bool {
        self.missions.front().is_some_and(|m| f(&m.kind))
    }

    /// Drop every queued mission. A step under way is allowed to finish
    /// through a reach-goal mission, and a fall keeps falling.
    pub fn cancel_missions(&mut self) {
        self.missions.clear();
        if self.falling {
            self.missions.push_back(Mission::fall());
        } else if let Some(mv) = &self.movement {
            self.missions.push_back(Mission::reach_goal(mv.to));
        }
    }

    pub fn update_missions(&mut self, ctx: &mut MissionContext, ticks: u32) {
        let mut updated = false;
        for _ in 0..ctx.config.missions.max_steps_per_update {
            let Some(mut mission) = self.missions.pop_front() else {
                return;
            };

            if !mission.started {
                mission.started = true;
                log::trace!("{}: start {}", self.id, mission.name());
                if let MissionStep::Prerequisite(p) = mission.start(self, ctx) {
                    self.push_prerequisite(mission, p, ctx);
                    continue;
                }
            }

            if mission.is_finished(self, ctx.mode) {
                self.finish(mission);
                continue;
            }
            if updated {
                self.missions.push_front(mission);
                return;
            }
            updated = true;

            match mission.update(self, ctx, ticks) {
                MissionStep::Prerequisite(p) => self.push_prerequisite(mission, p, ctx),
                MissionStep::Continue if mission.is_finished(self, ctx.mode) => {
                    self.finish(mission)
                }
                MissionStep::Continue => {
                    self.missions.push_front(mission);
                    return;
                }
            }
        }
        log::debug!(
            "{}: mission step budget exhausted with {} queued",
            self.id,
            self.missions.len()
        );
    }

    fn push_prerequisite(&mut self, parent: Mission, mut prerequisite: Mission, ctx: &MissionContext) {
        let depth = parent.depth + 1;
        if depth > ctx.config.missions.max_prerequisite_depth {
            log::error!(
                "{}: {} needs {} at depth {depth}, over the limit; dropping both",
                self.id,
                parent.name(),
                prerequisite.name()
            );
            return;
        }
        log::trace!("{}: {} needs {}", self.id, parent.name(), prerequisite.name());
        prerequisite.depth = depth;
        prerequisite.started = false;
        self.missions.push_front(parent);
        self.missions.push_front(prerequisite);
    }

    fn finish(&mut self, mission: Mission) {
        log::trace!("{}: finished {}", self.id, mission.name());
        if matches!(mission.kind, MissionKind::RestartNextMission) {
            if let Some(next) = self.missions.front_mut() {
                next.started = false;
            }
        }
    }
}

impl TileObject for BattleUnit {
    fn object_id(&self) -> ObjectId {
        self.object
    }

    fn kind(&self) -> ObjectKind {
        ObjectKind::Unit
    }

    fn position(&self) -> WorldPos {
        self.position
    }

    fn extent(&self) -> Extent {
        let e = self.profile.extent;
        if self.profile.large {
            Extent::new(e.x * 2.0, e.y * 2.0, e.z * 2.0)
        } else {
            e
        }
    }

    fn voxels(&self) -> Option<Arc<VoxelBody>> {
        self.body.clone()
    }
}
