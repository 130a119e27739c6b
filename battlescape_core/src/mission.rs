// Unit missions: the per-unit task queue's entries.
//
// A unit's behaviour is an ordered queue of `Mission`s; only the front one
// is active. Each mission has a three-part lifecycle driven by
// `BattleUnit::update_missions` (see `unit.rs`):
//
// - `start` runs once when the mission reaches the front of the queue (and
//   again if a `RestartNextMission` sentinel in front of it finishes).
// - `update(ticks)` advances the active mission. At most one mission is
//   updated per unit per call.
// - `is_finished` is a pure predicate; finished missions are popped.
//
// `start` and `update` may answer `MissionStep::Prerequisite`, asking the
// driver to push a simpler mission in front of this one (stand up before
// walking, turn before stepping, reach the tile centre before turning, wait
// for time units). Prerequisite chains terminate because every prerequisite
// is simpler than its requester: body-state prerequisites only ever ask for
// `Standing`, which every other posture reaches directly. The driver also
// bounds nesting with `MissionRules::max_prerequisite_depth`.
//
// The goto mission re-validates its next step with the unit's traversal
// policy before every step. If the step has become illegal the remaining plan
// is discarded and a `RestartNextMission` sentinel is pushed, so the goto is
// restarted and searches again (at most `max_replans` times). After popping a
// step it skips ahead over any following waypoint that is already adjacent
// and enterable.
//
// See also: `unit.rs` for the driver and movement helpers,
// `pathfinding.rs` for route planning, `passability.rs` for step legality.

use crate::config::BattleConfig;
use crate::event::{BattleEvent, BattleEventKind};
use crate::object::TileObject;
use crate::passability::TraversalPolicy;
use crate::tilemap::TileMap;
use crate::types::{BattleMode, BodyState, Facing, ItemId, TileCoord, WorldPos};
use crate::unit::BattleUnit;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Positions closer than this count as equal.
pub const POSITION_EPSILON: f32 = 1e-3;

/// Everything a mission may touch besides its own unit.
pub struct MissionContext<'a> {
    pub map: &'a mut TileMap,
    pub config: &'a BattleConfig,
    pub mode: BattleMode,
    pub tick: u64,
    pub events: &'a mut Vec<BattleEvent>,
    pub throws: &'a mut Vec<ThrowRequest>,
}

impl MissionContext<'_> {
    pub fn emit(&mut self, kind: BattleEventKind) {
        self.events.push(BattleEvent {
            tick: self.tick,
            kind,
        });
    }
}

/// An item leaving a unit's hand, for `Battle` to put in flight.
#[derive(Clone, Debug, PartialEq)]
pub struct ThrowRequest {
    pub item: ItemId,
    pub from: WorldPos,
    pub target: WorldPos,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum MissionKind {
    GotoLocation {
        target: TileCoord,
        /// Remaining planned tiles, next step first.
        plan: VecDeque<TileCoord>,
        replans: u32,
    },
    Turn {
        target: Facing,
        progress: u32,
    },
    ChangeBodyState {
        target: BodyState,
        progress: u32,
        abandoned: bool,
    },
    ThrowItem {
        item: ItemId,
        target: WorldPos,
        progress: u32,
        thrown: bool,
    },
    Snooze {
        remaining: u32,
    },
    Fall,
    AcquireTimeUnits {
        amount: u32,
    },
    /// Finishes immediately and makes the mission behind it start again.
    RestartNextMission,
    /// Move to an exact position (usually the resting position of the
    /// current tile) without path search.
    ReachGoal {
        goal: WorldPos,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Mission {
    pub kind: MissionKind,
    pub started: bool,
    /// Prerequisite nesting: 0 for missions queued from outside.
    pub depth: u32,
}

/// What the driver should do after `start` or `update`.
#[derive(Clone, Debug, PartialEq)]
pub enum MissionStep {
    Continue,
    /// Push this mission in front of the current one.
    Prerequisite(Mission),
}

impl Mission {
    fn new(kind: MissionKind) -> Self {
        Self {
            kind,
            started: false,
            depth: 0,
        }
    }

    pub fn goto(target: TileCoord) -> Self {
        Self::new(MissionKind::GotoLocation {
            target,
            plan: VecDeque::new(),
            replans: 0,
        })
    }

    pub fn turn(target: Facing) -> Self {
        Self::new(MissionKind::Turn {
            target,
            progress: 0,
        })
    }

    pub fn change_body_state(target: BodyState) -> Self {
        Self::new(MissionKind::ChangeBodyState {
            target,
            progress: 0,
            abandoned: false,
        })
    }

    pub fn throw_item(item: ItemId, target: WorldPos) -> Self {
        Self::new(MissionKind::ThrowItem {
            item,
            target,
            progress: 0,
            thrown: false,
        })
    }

    pub fn snooze(ticks: u32) -> Self {
        Self::new(MissionKind::Snooze { remaining: ticks })
    }

    pub fn fall() -> Self {
        Self::new(MissionKind::Fall)
    }

    pub fn acquire_time_units(amount: u32) -> Self {
        Self::new(MissionKind::AcquireTimeUnits { amount })
    }

    pub fn restart_next() -> Self {
        Self::new(MissionKind::RestartNextMission)
    }

    pub fn reach_goal(goal: WorldPos) -> Self {
        Self::new(MissionKind::ReachGoal { goal })
    }

    pub fn name(&self) -> &'static str {
        match self.kind {
            MissionKind::GotoLocation { .. } => "goto location",
            MissionKind::Turn { .. } => "turn",
            MissionKind::ChangeBodyState { .. } => "change body state",
            MissionKind::ThrowItem { .. } => "throw item",
            MissionKind::Snooze { .. } => "snooze",
            MissionKind::Fall => "fall",
            MissionKind::AcquireTimeUnits { .. } => "acquire time units",
            MissionKind::RestartNextMission => "restart next mission",
            MissionKind::ReachGoal { .. } => "reach goal",
        }
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    pub fn start(&mut self, unit: &mut BattleUnit, ctx: &mut MissionContext) -> MissionStep {
        match &mut self.kind {
            MissionKind::GotoLocation { target, plan, .. } => {
                if plan.is_empty() && !unit.is_dead() && unit.tile() != *target {
                    let limit = ctx.config.map.movement.path_iteration_limit;
                    *plan = unit.plan_route(ctx.map, *target, limit);
                }
                MissionStep::Continue
            }
            MissionKind::Turn { target, .. } => {
                if unit.facing != *target && unit.movement.is_none() {
                    let rest = unit.resting_position(ctx.map);
                    if unit.position.distance(rest) > POSITION_EPSILON {
                        return MissionStep::Prerequisite(Mission::reach_goal(rest));
                    }
                }
                MissionStep::Continue
            }
            MissionKind::ChangeBodyState {
                target, abandoned, ..
            } => {
                let target = *target;
                if unit.is_dead() || unit.body_state == target {
                    return MissionStep::Continue;
                }
                if target == BodyState::Downed {
                    log::warn!("{}: body state Downed cannot be requested", unit.id);
                    *abandoned = true;
                    return MissionStep::Continue;
                }
                if target == BodyState::Flying && !unit.profile.can_fly {
                    log::warn!("{} cannot fly; body state change abandoned", unit.id);
                    *abandoned = true;
                    return MissionStep::Continue;
                }
                if unit.body_state == BodyState::Flying
                    && !ctx.map.supports(unit.tile(), unit.profile.large)
                {
                    log::warn!("{} cannot land in mid-air; body state change abandoned", unit.id);
                    *abandoned = true;
                    return MissionStep::Continue;
                }
                if !unit.body_state.transitions_directly_to(target) {
                    return MissionStep::Prerequisite(Mission::change_body_state(
                        BodyState::Standing,
                    ));
                }
                MissionStep::Continue
            }
            MissionKind::Fall => {
                unit.falling = true;
                unit.movement = None;
                MissionStep::Continue
            }
            MissionKind::ReachGoal { goal } => {
                if unit.movement.is_none() && unit.position.distance(*goal) > POSITION_EPSILON {
                    let ticks = (unit.position.distance(*goal) * unit.profile.ticks_per_tile as f32)
                        .ceil() as u32;
                    unit.begin_movement(*goal, goal.tile(), ticks.max(1));
                }
                MissionStep::Continue
            }
            MissionKind::ThrowItem { .. }
            | MissionKind::Snooze { .. }
            | MissionKind::AcquireTimeUnits { .. }
            | MissionKind::RestartNextMission => MissionStep::Continue,
        }
    }

    pub fn update(
        &mut self,
        unit: &mut BattleUnit,
        ctx: &mut MissionContext,
        ticks: u32,
    ) -> MissionStep {
        if unit.is_dead() && !matches!(self.kind, MissionKind::Fall) {
            return MissionStep::Continue;
        }
        match &mut self.kind {
            MissionKind::GotoLocation {
                target,
                plan,
                replans,
            } => update_goto(unit, ctx, ticks, *target, plan, replans),
            MissionKind::Turn { target, progress } => {
                if unit.facing == *target {
                    return MissionStep::Continue;
                }
                let cost = unit.profile.time_units_per_turn;
                if ctx.mode == BattleMode::TurnBased && unit.time_units < cost {
                    return MissionStep::Prerequisite(Mission::acquire_time_units(cost));
                }
                *progress += ticks;
                if *progress >= unit.profile.turn_ticks.max(1) {
                    *progress = 0;
                    unit.facing = unit.facing.step_toward(*target);
                    if ctx.mode == BattleMode::TurnBased {
                        unit.time_units -= cost;
                    }
                    ctx.emit(BattleEventKind::UnitTurned {
                        unit: unit.id,
                        facing: unit.facing,
                    });
                }
                MissionStep::Continue
            }
            MissionKind::ChangeBodyState {
                target,
                progress,
                abandoned,
            } => {
                if *abandoned || unit.body_state == *target {
                    return MissionStep::Continue;
                }
                *progress += ticks;
                if *progress >= unit.profile.stance_change_ticks {
                    unit.body_state = *target;
                    ctx.emit(BattleEventKind::BodyStateChanged {
                        unit: unit.id,
                        state: *target,
                    });
                }
                MissionStep::Continue
            }
            MissionKind::ThrowItem {
                item,
                target,
                progress,
                thrown,
            } => {
                if *thrown {
                    return MissionStep::Continue;
                }
                if unit.body_state == BodyState::Prone {
                    return MissionStep::Prerequisite(Mission::change_body_state(
                        BodyState::Standing,
                    ));
                }
                let here = unit.position;
                if let Some(facing) = Facing::from_delta(
                    (target.x - here.x).round() as i32,
                    (target.y - here.y).round() as i32,
                ) {
                    if facing != unit.facing {
                        return MissionStep::Prerequisite(Mission::turn(facing));
                    }
                }
                let cost = unit.profile.throw_time_units;
                if ctx.mode == BattleMode::TurnBased && unit.time_units < cost {
                    return MissionStep::Prerequisite(Mission::acquire_time_units(cost));
                }
                *progress += ticks;
                if *progress >= unit.profile.throw_ticks {
                    *thrown = true;
                    if ctx.mode == BattleMode::TurnBased {
                        unit.time_units -= cost;
                    }
                    let from = WorldPos::new(here.x, here.y, here.z + unit.extent().z * 0.8);
                    ctx.throws.push(ThrowRequest {
                        item: *item,
                        from,
                        target: *target,
                    });
                    ctx.emit(BattleEventKind::ItemThrown {
                        unit: unit.id,
                        item: *item,
                    });
                }
                MissionStep::Continue
            }
            MissionKind::Snooze { remaining } => {
                *remaining = remaining.saturating_sub(ticks);
                MissionStep::Continue
            }
            MissionKind::Fall => {
                update_fall(unit, ctx, ticks);
                MissionStep::Continue
            }
            MissionKind::ReachGoal { goal } => {
                if unit.movement.is_none() && unit.position.distance(*goal) > POSITION_EPSILON {
                    let ticks = (unit.position.distance(*goal) * unit.profile.ticks_per_tile as f32)
                        .ceil() as u32;
                    unit.begin_movement(*goal, goal.tile(), ticks.max(1));
                }
                unit.advance_movement(ctx, ticks);
                MissionStep::Continue
            }
            MissionKind::AcquireTimeUnits { .. } | MissionKind::RestartNextMission => {
                MissionStep::Continue
            }
        }
    }

    pub fn is_finished(&self, unit: &BattleUnit, mode: BattleMode) -> bool {
        match &self.kind {
            MissionKind::GotoLocation { plan, .. } => {
                unit.is_dead() || (plan.is_empty() && unit.movement.is_none())
            }
            MissionKind::Turn { target, .. } => unit.is_dead() || unit.facing == *target,
            MissionKind::ChangeBodyState {
                target, abandoned, ..
            } => unit.is_dead() || *abandoned || unit.body_state == *target,
            MissionKind::ThrowItem { thrown, .. } => unit.is_dead() || *thrown,
            MissionKind::Snooze { remaining } => *remaining == 0,
            MissionKind::Fall => !unit.falling,
            MissionKind::AcquireTimeUnits { amount } => {
                unit.is_dead() || mode == BattleMode::RealTime || unit.time_units >= *amount
            }
            MissionKind::RestartNextMission => true,
            MissionKind::ReachGoal { goal } => {
                unit.is_dead()
                    || (unit.movement.is_none()
                        && unit.position.distance(*goal) <= POSITION_EPSILON)
            }
        }
    }
}

fn update_goto(
    unit: &mut BattleUnit,
    ctx: &mut MissionContext,
    ticks: u32,
    target: TileCoord,
    plan: &mut VecDeque<TileCoord>,
    replans: &mut u32,
) -> MissionStep {
    if unit.movement.is_some() {
        if !unit.advance_movement(ctx, ticks) {
            return MissionStep::Continue;
        }
    }
    let Some(&planned) = plan.front() else {
        return MissionStep::Continue;
    };

    let here = unit.tile();
    let policy = unit.policy();
    if policy.can_enter(ctx.map, here, planned).is_none() {
        plan.clear();
        if *replans < ctx.config.missions.max_replans {
            *replans += 1;
            log::debug!(
                "{}: step {here} → {planned} no longer legal; replanning ({}/{})",
                unit.id,
                replans,
                ctx.config.missions.max_replans
            );
            return MissionStep::Prerequisite(Mission::restart_next());
        }
        log::warn!("{}: giving up on {target} after {replans} replans", unit.id);
        ctx.emit(BattleEventKind::GotoAbandoned {
            unit: unit.id,
            target,
        });
        return MissionStep::Continue;
    }

    let mut next = planned;
    plan.pop_front();
    while let Some(&after) = plan.front() {
        if here.is_adjacent(after) && policy.can_enter(ctx.map, here, after).is_some() {
            next = after;
            plan.pop_front();
        } else {
            break;
        }
    }

    let large = unit.profile.large;
    if unit.profile.can_fly
        && unit.body_state != BodyState::Flying
        && !ctx.map.supports(next, large)
    {
        plan.push_front(next);
        return MissionStep::Prerequisite(Mission::change_body_state(BodyState::Flying));
    }
    if matches!(unit.body_state, BodyState::Kneeling | BodyState::Prone) {
        plan.push_front(next);
        return MissionStep::Prerequisite(Mission::change_body_state(BodyState::Standing));
    }
    if let Some(facing) = Facing::from_delta(next.x - here.x, next.y - here.y) {
        if facing != unit.facing {
            plan.push_front(next);
            return MissionStep::Prerequisite(Mission::turn(facing));
        }
    }

    let Some(cost) = policy.can_enter(ctx.map, here, next) else {
        plan.push_front(next);
        return MissionStep::Continue;
    };
    if ctx.mode == BattleMode::TurnBased {
        let needed = unit.profile.step_time_units(cost);
        if needed > unit.profile.max_time_units {
            log::warn!(
                "{}: step {here} → {next} costs {needed} time units, more than a full turn",
                unit.id
            );
            plan.clear();
            ctx.emit(BattleEventKind::GotoAbandoned {
                unit: unit.id,
                target,
            });
            return MissionStep::Continue;
        }
        if unit.time_units < needed {
            plan.push_front(next);
            return MissionStep::Prerequisite(Mission::acquire_time_units(needed));
        }
        unit.time_units -= needed;
    }

    let to = ctx.map.resting_position(next, large);
    unit.begin_movement(to, next, unit.profile.step_ticks(cost));
    MissionStep::Continue
}

fn update_fall(unit: &mut BattleUnit, ctx: &mut MissionContext, ticks: u32) {
    if !unit.falling {
        return;
    }
    let large = unit.profile.large;
    let drop = ctx.config.missions.fall_tiles_per_tick * ticks as f32;
    let mut pos = unit.position;
    pos.z = (pos.z - drop).max(0.0);
    let tile = pos.tile();
    let rest = ctx.map.resting_position(tile, large);
    let landed = (ctx.map.supports(tile, large) && pos.z <= rest.z) || pos.z <= 0.0;
    if landed {
        unit.set_position(ctx.map, rest);
        unit.falling = false;
        ctx.emit(BattleEventKind::UnitLanded {
            unit: unit.id,
            tile,
        });
    } else {
        unit.set_position(ctx.map, pos);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missions_serialize_losslessly() {
        let mut goto = Mission::goto(TileCoord::new(5, 5, 0));
        if let MissionKind::GotoLocation { plan, .. } = &mut goto.kind {
            plan.extend([TileCoord::new(1, 1, 0), TileCoord::new(2, 2, 0)]);
        }
        goto.started = true;
        let queue = vec![
            goto,
            Mission::turn(Facing::SouthWest),
            Mission::throw_item(ItemId(3), WorldPos::new(4.5, 1.5, 0.25)),
            Mission::snooze(12),
            Mission::reach_goal(WorldPos::new(0.5, 0.5, 0.0)),
        ];
        let bytes = bincode::serialize(&queue).unwrap();
        let restored: Vec<Mission> = bincode::deserialize(&bytes).unwrap();
        assert_eq!(queue, restored);
    }

    #[test]
    fn names_are_distinct() {
        let names = [
            Mission::goto(TileCoord::new(0, 0, 0)).name(),
            Mission::turn(Facing::North).name(),
            Mission::change_body_state(BodyState::Prone).name(),
            Mission::throw_item(ItemId(0), WorldPos::default()).name(),
            Mission::snooze(1).name(),
            Mission::fall().name(),
            Mission::acquire_time_units(1).name(),
            Mission::restart_next().name(),
            Mission::reach_goal(WorldPos::default()).name(),
        ];
        let unique: std::collections::BTreeSet<_> = names.iter().collect();
        assert_eq!(unique.len(), names.len());
    }
}
