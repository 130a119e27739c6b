// Battle state and tick loop.
//
// `Battle` is the single source of truth for one battlescape: the config,
// the map part catalog and placed parts, units, loose items, projectiles,
// and effects. The tile map is derived from those collections. Every entity
// that occupies space is inserted into the map when it is created and
// removed when it goes away.
//
// ## Tick loop
//
// `step(commands, target_tick)` applies each command at its tick (stable
// order within a tick) and advances one tick at a time. `update(ticks)`
// advances without commands. Within a tick, categories are processed in a
// fixed order:
//
//   1. Structure: map parts have no per-tick work; their caches are kept
//      current by the map on every mutation.
//   2. Units, in `UnitId` order. Before its missions run, a unit standing
//      on nothing gets a `Fall` mission pushed in front (or, if it can fly,
//      a change to `Flying`).
//   3. Items thrown by units this tick are launched, then all items advance.
//   4. Projectiles, in `ProjectileId` order. Impacts damage units and may
//      destroy map parts with a `strength`.
//   5. Effects count down and expire.
//
// Events produced by spawns, removals, and the tick loop are collected in
// an outbox and returned by the next `step`/`update`.
//
// ## Ids
//
// One counter feeds every id. An entity's own id and its map `ObjectId`
// share the same number, so object ids are unique across kinds.
//
// ## Save/load
//
// `Battle` derives serde. The tile map and the outbox are `#[serde(skip)]`;
// `rebuild_transient_state` reconstructs the map by inserting every part
// and entity again in id order (parts first, so caches are in place before
// units arrive). `to_json`/`from_json` wrap the full cycle.
//
// See also: `unit.rs` and `mission.rs` for unit behaviour, `tilemap.rs` for
// the spatial index, `command.rs` and `event.rs` for the external
// interface, `config.rs` for `BattleConfig`.
//
// **Critical constraint: determinism.** All state changes flow through
// the methods here. Every iterated collection is ordered by id, and nothing
// reads wall-clock time or hashes.

use crate::collision::Collision;
use crate::command::{BattleAction, BattleCommand};
use crate::config::BattleConfig;
use crate::effect::Effect;
use crate::error::{BattleError, BattleResult};
use crate::event::{BattleEvent, BattleEventKind};
use crate::item::BattleItem;
use crate::map_part::{MapPart, MapPartType};
use crate::mission::{Mission, MissionContext, MissionKind, ThrowRequest};
use crate::object::TileObject;
use crate::projectile::{Projectile, ProjectileOutcome};
use crate::tilemap::TileMap;
use crate::types::*;
use crate::unit::BattleUnit;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Events produced by a call to `step` or `update`.
#[derive(Clone, Debug, Default)]
pub struct StepResult {
    pub events: Vec<BattleEvent>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Battle {
    pub tick: u64,
    pub mode: BattleMode,
    pub config: BattleConfig,
    next_id: u32,
    pub part_types: BTreeMap<MapPartTypeId, MapPartType>,
    pub map_parts: BTreeMap<MapPartId, MapPart>,
    pub units: BTreeMap<UnitId, BattleUnit>,
    pub items: BTreeMap<ItemId, BattleItem>,
    pub projectiles: BTreeMap<ProjectileId, Projectile>,
    pub effects: BTreeMap<EffectId, Effect>,

    #[serde(skip)]
    map: TileMap,
    #[serde(skip)]
    outbox: Vec<BattleEvent>,
}

impl Battle {
    pub fn new(config: BattleConfig) -> BattleResult<Self> {
        let map = TileMap::new(config.map.clone())?;
        Ok(Self {
            tick: 0,
            mode: BattleMode::RealTime,
            config,
            next_id: 1,
            part_types: BTreeMap::new(),
            map_parts: BTreeMap::new(),
            units: BTreeMap::new(),
            items: BTreeMap::new(),
            projectiles: BTreeMap::new(),
            effects: BTreeMap::new(),
            map,
            outbox: Vec::new(),
        })
    }

    pub fn map(&self) -> &TileMap {
        &self.map
    }

    pub fn unit(&self, id: UnitId) -> Option<&BattleUnit> {
        self.units.get(&id)
    }

    fn alloc_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn emit(&mut self, kind: BattleEventKind) {
        self.outbox.push(BattleEvent {
            tick: self.tick,
            kind,
        });
    }

    // -----------------------------------------------------------------------
    // Map parts
    // -----------------------------------------------------------------------

    pub fn add_part_type(&mut self, part_type: MapPartType) -> MapPartTypeId {
        let id = MapPartTypeId(self.alloc_id());
        self.part_types.insert(id, part_type);
        id
    }

    pub fn place_map_part(&mut self, part_type: MapPartTypeId, tile: TileCoord) -> BattleResult<MapPartId> {
        let ty = self
            .part_types
            .get(&part_type)
            .ok_or(BattleError::UnknownPartType(part_type))?;
        if !self.map.in_bounds(tile) {
            return Err(BattleError::OutOfBounds { coord: tile });
        }
        let n = self.next_id;
        let part = MapPart {
            id: MapPartId(n),
            object: ObjectId(n),
            part_type,
            tile,
        };
        if self.map.insert(&part.placement(ty)).is_none() {
            return Err(BattleError::PlacementFailed(part.object));
        }
        self.next_id += 1;
        self.map_parts.insert(part.id, part);
        Ok(MapPartId(n))
    }

    /// Remove a placed part. Units and items it was holding up fall on the
    /// next tick.
    pub fn destroy_map_part(&mut self, id: MapPartId) -> bool {
        let Some(part) = self.map_parts.remove(&id) else {
            return false;
        };
        self.map.remove(part.object);
        log::debug!("map part {} at {} destroyed", id.0, part.tile);
        self.emit(BattleEventKind::MapPartDestroyed { part: id });
        true
    }

    // -----------------------------------------------------------------------
    // Units
    // -----------------------------------------------------------------------

    /// Spawn a unit standing on `tile`. Large units need their whole
    /// footprint inside the map.
    pub fn spawn_unit(&mut self, archetype: Archetype, tile: TileCoord) -> BattleResult<UnitId> {
        let profile = self.config.profile(archetype)?.clone();
        if let Some(&outside) = TileMap::footprint(tile, profile.large)
            .iter()
            .find(|&&c| !self.map.in_bounds(c))
        {
            return Err(BattleError::OutOfBounds { coord: outside });
        }
        let n = self.next_id;
        let position = self.map.resting_position(tile, profile.large);
        let unit = BattleUnit::new(
            UnitId(n),
            ObjectId(n),
            archetype,
            profile,
            position,
            self.map.voxel_size(),
        );
        if self.map.insert(&unit).is_none() {
            return Err(BattleError::PlacementFailed(unit.object));
        }
        self.next_id += 1;
        self.units.insert(unit.id, unit);
        self.emit(BattleEventKind::UnitSpawned {
            unit: UnitId(n),
            tile,
        });
        Ok(UnitId(n))
    }

    pub fn remove_unit(&mut self, id: UnitId) -> bool {
        let Some(unit) = self.units.remove(&id) else {
            return false;
        };
        self.map.remove(unit.object);
        self.emit(BattleEventKind::UnitRemoved { unit: id });
        true
    }

    pub fn queue_mission(&mut self, unit: UnitId, mission: Mission) -> BattleResult<()> {
        self.units
            .get_mut(&unit)
            .ok_or(BattleError::UnknownUnit(unit))?
            .queue_mission(mission);
        Ok(())
    }

    /// Refill every living unit's time units.
    pub fn begin_turn(&mut self) {
        for unit in self.units.values_mut().filter(|u| !u.is_dead()) {
            unit.time_units = unit.profile.max_time_units;
        }
        log::debug!("turn begins at tick {}", self.tick);
    }

    // -----------------------------------------------------------------------
    // Items, projectiles, effects
    // -----------------------------------------------------------------------

    /// Drop an item at `position`; it falls to the nearest surface below.
    pub fn drop_item(&mut self, position: WorldPos) -> BattleResult<ItemId> {
        let n = self.next_id;
        let item = BattleItem::new(ItemId(n), ObjectId(n), position);
        if self.map.insert(&item).is_none() {
            return Err(BattleError::PlacementFailed(item.object));
        }
        self.next_id += 1;
        self.items.insert(item.id, item);
        Ok(ItemId(n))
    }

    pub fn fire_projectile(
        &mut self,
        shooter: Option<ObjectId>,
        from: WorldPos,
        velocity: WorldPos,
        range_ticks: u32,
        damage: u32,
    ) -> BattleResult<ProjectileId> {
        let n = self.next_id;
        let projectile = Projectile {
            id: ProjectileId(n),
            object: ObjectId(n),
            shooter,
            position: from,
            velocity,
            remaining: range_ticks,
            damage,
        };
        if self.map.insert(&projectile).is_none() {
            return Err(BattleError::PlacementFailed(projectile.object));
        }
        self.next_id += 1;
        self.projectiles.insert(projectile.id, projectile);
        Ok(ProjectileId(n))
    }

    /// Fire from a unit's eyes at the centre of another unit's body.
    pub fn fire_at_unit(
        &mut self,
        shooter: UnitId,
        target: UnitId,
        speed: f32,
        damage: u32,
    ) -> BattleResult<ProjectileId> {
        let from_unit = self.units.get(&shooter).ok_or(BattleError::UnknownUnit(shooter))?;
        let to_unit = self.units.get(&target).ok_or(BattleError::UnknownUnit(target))?;
        let eye = from_unit.position
            + WorldPos::new(0.0, 0.0, from_unit.extent().z * 0.8);
        let vs = self.map.voxel_size();
        let aim = self
            .map
            .object(to_unit.object)
            .map_or(to_unit.position, |o| o.aim_point(vs));
        let distance = eye.distance(aim);
        let velocity = if distance > 0.0 && speed > 0.0 {
            (aim - eye) * (speed / distance)
        } else {
            WorldPos::default()
        };
        let range = (distance / speed.max(f32::EPSILON)).ceil() as u32 * 2 + 1;
        let shooter_object = Some(from_unit.object);
        self.fire_projectile(shooter_object, eye, velocity, range, damage)
    }

    pub fn spawn_effect(&mut self, position: WorldPos, extent: Extent, lifetime: u32) -> BattleResult<EffectId> {
        let n = self.next_id;
        let effect = Effect {
            id: EffectId(n),
            object: ObjectId(n),
            position,
            extent,
            remaining: lifetime,
        };
        if self.map.insert(&effect).is_none() {
            return Err(BattleError::PlacementFailed(effect.object));
        }
        self.next_id += 1;
        self.effects.insert(effect.id, effect);
        Ok(EffectId(n))
    }

    // -----------------------------------------------------------------------
    // Commands and the tick loop
    // -----------------------------------------------------------------------

    /// Apply commands and advance to `target_tick`. Commands are applied at
    /// their tick, in submission order within a tick; commands for ticks
    /// already past are applied immediately.
    pub fn step(&mut self, commands: &[BattleCommand], target_tick: u64) -> StepResult {
        let mut sorted: Vec<&BattleCommand> = commands
            .iter()
            .filter(|c| {
                let keep = c.tick <= target_tick;
                if !keep {
                    log::warn!("command for tick {} beyond target {target_tick} ignored", c.tick);
                }
                keep
            })
            .collect();
        sorted.sort_by_key(|c| c.tick);

        let mut next = sorted.into_iter().peekable();
        loop {
            while let Some(cmd) = next.next_if(|c| c.tick <= self.tick) {
                self.apply_command(cmd);
            }
            if self.tick >= target_tick {
                break;
            }
            self.advance_tick();
        }
        StepResult {
            events: std::mem::take(&mut self.outbox),
        }
    }

    /// Advance `ticks` ticks without commands.
    pub fn update(&mut self, ticks: u32) -> StepResult {
        for _ in 0..ticks {
            self.advance_tick();
        }
        StepResult {
            events: std::mem::take(&mut self.outbox),
        }
    }

    pub fn apply_command(&mut self, cmd: &BattleCommand) {
        let mission = match &cmd.action {
            BattleAction::MoveUnit { target, .. } => Mission::goto(*target),
            BattleAction::TurnUnit { facing, .. } => Mission::turn(*facing),
            BattleAction::SetBodyState { state, .. } => Mission::change_body_state(*state),
            BattleAction::ThrowItem { item, target, .. } => Mission::throw_item(*item, *target),
            BattleAction::Snooze { ticks, .. } => Mission::snooze(*ticks),
            BattleAction::CancelMissions { unit } => {
                match self.units.get_mut(unit) {
                    Some(u) => u.cancel_missions(),
                    None => log::warn!("cancel for unknown {unit}"),
                }
                return;
            }
            BattleAction::BeginTurn => {
                self.begin_turn();
                return;
            }
        };
        let Some(unit) = cmd.action.unit() else {
            return;
        };
        if let Err(e) = self.queue_mission(unit, mission) {
            log::warn!("command at tick {} dropped: {e}", cmd.tick);
        }
    }

    fn advance_tick(&mut self) {
        self.tick += 1;
        let mut throws = Vec::new();
        self.update_units(&mut throws);
        self.launch_throws(throws);
        self.update_items();
        self.update_projectiles();
        self.update_effects();
    }

    fn update_units(&mut self, throws: &mut Vec<ThrowRequest>) {
        let mut events = std::mem::take(&mut self.outbox);
        for unit in self.units.values_mut() {
            Self::check_support(unit, &self.map);
            let mut ctx = MissionContext {
                map: &mut self.map,
                config: &self.config,
                mode: self.mode,
                tick: self.tick,
                events: &mut events,
                throws: &mut *throws,
            };
            unit.update_missions(&mut ctx, 1);
        }
        self.outbox = events;
    }

    /// Push a fall (or take-off) in front of a unit left standing on nothing.
    fn check_support(unit: &mut BattleUnit, map: &TileMap) {
        if unit.falling || unit.movement.is_some() || map.supports(unit.tile(), unit.profile.large) {
            return;
        }
        if unit.profile.can_fly && !unit.is_dead() {
            let taking_off = unit.current_mission_is(|k| {
                matches!(
                    k,
                    MissionKind::ChangeBodyState {
                        target: BodyState::Flying,
                        ..
                    }
                )
            });
            if unit.body_state != BodyState::Flying && !taking_off {
                unit.missions.push_front(Mission::change_body_state(BodyState::Flying));
            }
            return;
        }
        log::debug!("{} unsupported at {}; falling", unit.id, unit.tile());
        unit.missions.push_front(Mission::fall());
    }

    fn launch_throws(&mut self, throws: Vec<ThrowRequest>) {
        for req in throws {
            match self.items.get_mut(&req.item) {
                Some(item) => item.launch(req.from, req.target),
                None => log::warn!("throw of unknown {}", req.item),
            }
        }
    }

    fn update_items(&mut self) {
        let fall_speed = self.config.missions.fall_tiles_per_tick;
        let mut landed = Vec::new();
        for item in self.items.values_mut() {
            if item.is_resting() && !Self::item_supported(&self.map, item.position) {
                item.falling = true;
            }
            if let Some(tile) = item.update(&mut self.map, fall_speed, 1) {
                landed.push((item.id, tile));
            }
        }
        for (item, tile) in landed {
            self.emit(BattleEventKind::ItemLanded { item, tile });
        }
    }

    fn item_supported(map: &TileMap, position: WorldPos) -> bool {
        let tile = position.tile();
        position.z <= 0.0
            || (map.supports(tile, false)
                && position.z <= map.resting_position(tile, false).z)
    }

    fn update_projectiles(&mut self) {
        let ids: Vec<ProjectileId> = self.projectiles.keys().copied().collect();
        for id in ids {
            let Some(projectile) = self.projectiles.get_mut(&id) else {
                continue;
            };
            let outcome = projectile.update(&mut self.map, 1);
            let (object, damage) = (projectile.object, projectile.damage);
            match outcome {
                ProjectileOutcome::InFlight => {}
                ProjectileOutcome::Impact(hit) => {
                    self.projectiles.remove(&id);
                    self.map.remove(object);
                    self.emit(BattleEventKind::ProjectileImpact {
                        projectile: id,
                        object: hit.object,
                        kind: hit.kind,
                        position: hit.position,
                    });
                    self.apply_hit(&hit, damage);
                }
                ProjectileOutcome::Expired => {
                    self.projectiles.remove(&id);
                    self.map.remove(object);
                    self.emit(BattleEventKind::ProjectileExpired { projectile: id });
                }
            }
        }
    }

    fn apply_hit(&mut self, hit: &Collision, damage: u32) {
        match hit.kind {
            ObjectKind::Unit => {
                let Some(unit) = self.units.values_mut().find(|u| u.object == hit.object) else {
                    log::error!("hit on {} with no unit record", hit.object);
                    return;
                };
                let id = unit.id;
                if unit.take_damage(damage) {
                    self.emit(BattleEventKind::BodyStateChanged {
                        unit: id,
                        state: BodyState::Downed,
                    });
                }
            }
            kind if kind.is_structural() => {
                let destroyed = self
                    .map_parts
                    .values()
                    .find(|p| p.object == hit.object)
                    .filter(|p| {
                        self.part_types
                            .get(&p.part_type)
                            .and_then(|t| t.strength)
                            .is_some_and(|s| damage >= s)
                    })
                    .map(|p| p.id);
                if let Some(part) = destroyed {
                    self.destroy_map_part(part);
                }
            }
            _ => {}
        }
    }

    fn update_effects(&mut self) {
        let expired: Vec<EffectId> = self
            .effects
            .values_mut()
            .filter_map(|e| e.update(1).then_some(e.id))
            .collect();
        for id in expired {
            if let Some(effect) = self.effects.remove(&id) {
                self.map.remove(effect.object);
            }
            self.emit(BattleEventKind::EffectExpired { effect: id });
        }
    }

    // -----------------------------------------------------------------------
    // Save/load
    // -----------------------------------------------------------------------

    /// Rebuild the tile map (and unit bodies) from the persisted collections.
    pub fn rebuild_transient_state(&mut self) -> BattleResult<()> {
        let mut map = TileMap::new(self.config.map.clone())?;
        for part in self.map_parts.values() {
            let Some(ty) = self.part_types.get(&part.part_type) else {
                log::error!("map part {} refers to unknown {}", part.id.0, part.part_type);
                continue;
            };
            if map.insert(&part.placement(ty)).is_none() {
                log::error!("map part {} could not be restored at {}", part.id.0, part.tile);
            }
        }
        let vs = map.voxel_size();
        for unit in self.units.values_mut() {
            unit.rebuild_body(vs);
            map.insert(unit);
        }
        for item in self.items.values() {
            map.insert(item);
        }
        for projectile in self.projectiles.values() {
            map.insert(projectile);
        }
        for effect in self.effects.values() {
            map.insert(effect);
        }
        self.map = map;
        Ok(())
    }

    pub fn to_json(&self) -> BattleResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> BattleResult<Self> {
        let mut battle: Battle = serde_json::from_str(json)?;
        battle.config.map.validate()?;
        battle.rebuild_transient_state()?;
        Ok(battle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TileMapConfig;

    fn floored_battle(x: i32, y: i32, z: i32) -> Battle {
        let config = BattleConfig {
            map: TileMapConfig::with_size(x, y, z),
            ..BattleConfig::default()
        };
        let mut battle = Battle::new(config).unwrap();
        let floor = battle.add_part_type(MapPartType::floor(battle.map().voxel_size()));
        for ty in 0..y {
            for tx in 0..x {
                battle.place_map_part(floor, TileCoord::new(tx, ty, 0)).unwrap();
            }
        }
        battle
    }

    fn move_cmd(tick: u64, unit: UnitId, target: TileCoord) -> BattleCommand {
        BattleCommand {
            tick,
            action: BattleAction::MoveUnit { unit, target },
        }
    }

    #[test]
    fn placement_errors() {
        let mut battle = floored_battle(4, 4, 2);
        assert!(matches!(
            battle.place_map_part(MapPartTypeId(999), TileCoord::new(0, 0, 0)),
            Err(BattleError::UnknownPartType(_))
        ));
        let floor = *battle.part_types.keys().next().unwrap();
        assert!(matches!(
            battle.place_map_part(floor, TileCoord::new(4, 0, 0)),
            Err(BattleError::OutOfBounds { .. })
        ));
        assert!(matches!(
            battle.spawn_unit(Archetype::Megaspawn, TileCoord::new(0, 0, 0)),
            Err(BattleError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn spawn_emits_event_and_places_unit() {
        let mut battle = floored_battle(4, 4, 2);
        let id = battle.spawn_unit(Archetype::Agent, TileCoord::new(2, 1, 0)).unwrap();
        let result = battle.update(1);
        assert!(result.events.iter().any(|e| e.kind
            == BattleEventKind::UnitSpawned {
                unit: id,
                tile: TileCoord::new(2, 1, 0)
            }));
        let unit = battle.unit(id).unwrap();
        assert_eq!(battle.map().owner_of(unit.object), Some(TileCoord::new(2, 1, 0)));
    }

    #[test]
    fn move_command_reaches_target() {
        let mut battle = floored_battle(8, 8, 2);
        let id = battle.spawn_unit(Archetype::Agent, TileCoord::new(0, 0, 0)).unwrap();
        let result = battle.step(&[move_cmd(0, id, TileCoord::new(5, 5, 0))], 300);
        assert_eq!(battle.tick, 300);
        let unit = battle.unit(id).unwrap();
        assert!(unit.missions.is_empty());
        assert_eq!(unit.tile(), TileCoord::new(5, 5, 0));
        assert_eq!(unit.position, battle.map().resting_position(TileCoord::new(5, 5, 0), false));
        let steps = result
            .events
            .iter()
            .filter(|e| matches!(e.kind, BattleEventKind::UnitStepped { .. }))
            .count();
        assert_eq!(steps, 5);
    }

    #[test]
    fn unit_falls_when_support_destroyed() {
        let mut battle = floored_battle(4, 4, 3);
        let block = battle.add_part_type(MapPartType::solid_block(battle.map().voxel_size()));
        let part = battle.place_map_part(block, TileCoord::new(1, 1, 0)).unwrap();
        let id = battle.spawn_unit(Archetype::Agent, TileCoord::new(1, 1, 1)).unwrap();
        assert_eq!(battle.unit(id).unwrap().position.z, 1.0);

        assert!(battle.destroy_map_part(part));
        let result = battle.update(20);
        let unit = battle.unit(id).unwrap();
        assert_eq!(unit.position, WorldPos::new(1.5, 1.5, 0.0));
        assert!(!unit.falling);
        assert!(result.events.iter().any(|e| e.kind
            == BattleEventKind::UnitLanded {
                unit: id,
                tile: TileCoord::new(1, 1, 0)
            }));
        assert!(result
            .events
            .iter()
            .any(|e| e.kind == BattleEventKind::MapPartDestroyed { part }));
    }

    #[test]
    fn flyer_takes_off_instead_of_falling() {
        let mut battle = floored_battle(4, 4, 3);
        let block = battle.add_part_type(MapPartType::solid_block(battle.map().voxel_size()));
        let part = battle.place_map_part(block, TileCoord::new(1, 1, 0)).unwrap();
        let id = battle.spawn_unit(Archetype::Skeletoid, TileCoord::new(1, 1, 1)).unwrap();
        battle.destroy_map_part(part);
        battle.update(20);
        let unit = battle.unit(id).unwrap();
        assert_eq!(unit.body_state, BodyState::Flying);
        assert_eq!(unit.position.z, 1.0);
    }

    #[test]
    fn projectile_destroys_weak_wall() {
        let mut battle = floored_battle(8, 3, 2);
        let vs = battle.map().voxel_size();
        let fence = battle.add_part_type(MapPartType::left_wall(vs).with_strength(5));
        let part = battle.place_map_part(fence, TileCoord::new(4, 1, 0)).unwrap();
        let object = battle.map_parts[&part].object;
        battle
            .fire_projectile(None, WorldPos::new(0.5, 1.5, 0.5), WorldPos::new(1.0, 0.0, 0.0), 20, 10)
            .unwrap();
        let result = battle.update(10);
        assert!(result.events.iter().any(|e| matches!(
            e.kind,
            BattleEventKind::ProjectileImpact {
                kind: ObjectKind::LeftWall,
                ..
            }
        )));
        assert!(!battle.map_parts.contains_key(&part));
        assert!(!battle.map().contains(object));
        assert!(battle.projectiles.is_empty());
    }

    #[test]
    fn shot_downs_target_unit() {
        let mut battle = floored_battle(8, 3, 2);
        let shooter = battle.spawn_unit(Archetype::Agent, TileCoord::new(1, 1, 0)).unwrap();
        let target = battle.spawn_unit(Archetype::Brainsucker, TileCoord::new(5, 1, 0)).unwrap();
        battle.fire_at_unit(shooter, target, 1.0, 100).unwrap();
        let result = battle.update(12);
        assert!(battle.unit(target).unwrap().is_dead());
        assert!(!battle.unit(shooter).unwrap().is_dead());
        assert!(result.events.iter().any(|e| e.kind
            == BattleEventKind::BodyStateChanged {
                unit: target,
                state: BodyState::Downed
            }));
    }

    #[test]
    fn thrown_item_lands_at_target() {
        let mut battle = floored_battle(8, 3, 2);
        let thrower = battle.spawn_unit(Archetype::Agent, TileCoord::new(1, 1, 0)).unwrap();
        let item = battle.drop_item(WorldPos::new(1.5, 1.5, 0.0)).unwrap();
        let throw = BattleCommand {
            tick: 1,
            action: BattleAction::ThrowItem {
                unit: thrower,
                item,
                target: WorldPos::new(5.5, 1.5, 0.0),
            },
        };
        let result = battle.step(&[throw], 100);
        let landings: Vec<TileCoord> = result
            .events
            .iter()
            .filter_map(|e| match e.kind {
                BattleEventKind::ItemLanded { tile, .. } => Some(tile),
                _ => None,
            })
            .collect();
        assert_eq!(landings.last(), Some(&TileCoord::new(5, 1, 0)));
        assert!(result
            .events
            .iter()
            .any(|e| e.kind == BattleEventKind::ItemThrown { unit: thrower, item }));
        assert!(battle.items[&item].is_resting());
    }

    #[test]
    fn effect_expires_and_leaves_map() {
        let mut battle = floored_battle(4, 4, 2);
        let smoke = battle
            .spawn_effect(WorldPos::new(1.5, 1.5, 0.5), Extent::TILE, 3)
            .unwrap();
        let object = battle.effects[&smoke].object;
        assert!(battle.map().contains(object));
        let result = battle.update(3);
        assert!(result
            .events
            .iter()
            .any(|e| e.kind == BattleEventKind::EffectExpired { effect: smoke }));
        assert!(!battle.map().contains(object));
    }

    #[test]
    fn begin_turn_refills_time_units() {
        let mut battle = floored_battle(4, 4, 2);
        battle.mode = BattleMode::TurnBased;
        let id = battle.spawn_unit(Archetype::Agent, TileCoord::new(0, 0, 0)).unwrap();
        battle.units.get_mut(&id).unwrap().time_units = 0;
        battle.step(
            &[BattleCommand {
                tick: 0,
                action: BattleAction::BeginTurn,
            }],
            1,
        );
        let unit = battle.unit(id).unwrap();
        assert_eq!(unit.time_units, unit.profile.max_time_units);
    }

    #[test]
    fn save_load_rebuilds_map_and_stays_in_lockstep() {
        let mut battle = floored_battle(8, 8, 2);
        let id = battle.spawn_unit(Archetype::Agent, TileCoord::new(0, 0, 0)).unwrap();
        battle.step(&[move_cmd(0, id, TileCoord::new(6, 3, 0))], 20);

        let json = battle.to_json().unwrap();
        let mut restored = Battle::from_json(&json).unwrap();
        assert_eq!(restored.map().object_count(), battle.map().object_count());
        let object = battle.unit(id).unwrap().object;
        assert_eq!(restored.map().owner_of(object), battle.map().owner_of(object));

        battle.step(&[], 300);
        restored.step(&[], 300);
        let (a, b) = (battle.unit(id).unwrap(), restored.unit(id).unwrap());
        assert_eq!(a.position, b.position);
        assert_eq!(a.tile(), TileCoord::new(6, 3, 0));
    }

    #[test]
    fn battle_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Battle>();
    }

    #[test]
    fn commands_for_unknown_units_are_dropped() {
        let mut battle = floored_battle(4, 4, 2);
        let result = battle.step(&[move_cmd(0, UnitId(4242), TileCoord::new(1, 1, 0))], 5);
        assert!(result.events.is_empty());
        assert_eq!(battle.tick, 5);
    }
}
