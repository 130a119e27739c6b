// Scenario harness for battlescape integration tests.
//
// Wraps a real `Battle` (from `battlescape_core::battle`) with a small
// builder for test maps and a synchronous command API: queue an action,
// run until every unit's mission queue is empty, inspect state and events.
// All simulation goes through the same `Battle::step` path as the game.
//
// See also: `tests/scenarios.rs` for the scenarios.

use battlescape_core::battle::Battle;
use battlescape_core::command::{BattleAction, BattleCommand};
use battlescape_core::config::{BattleConfig, TileMapConfig};
use battlescape_core::event::BattleEvent;
use battlescape_core::map_part::MapPartType;
use battlescape_core::types::{Archetype, MapPartId, MapPartTypeId, TileCoord, UnitId};

/// Upper bound on ticks any scenario may take to settle.
pub const SETTLE_LIMIT: u64 = 5_000;

/// Install `env_logger` once per test binary. Output is captured by the
/// test runner; set `RUST_LOG` to see it.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Part types every test map has available.
pub struct Catalog {
    pub floor: MapPartTypeId,
    pub block: MapPartTypeId,
    pub left_wall: MapPartTypeId,
    pub right_wall: MapPartTypeId,
    pub lift: MapPartTypeId,
}

pub struct TestBattle {
    pub battle: Battle,
    pub catalog: Catalog,
    /// Every event returned so far.
    pub events: Vec<BattleEvent>,
}

impl TestBattle {
    /// An empty map of the given size with the standard catalog.
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        init_logging();
        let config = BattleConfig {
            map: TileMapConfig::with_size(x, y, z),
            ..BattleConfig::default()
        };
        let mut battle = Battle::new(config).expect("test map config is valid");
        let vs = battle.map().voxel_size();
        let catalog = Catalog {
            floor: battle.add_part_type(MapPartType::floor(vs)),
            block: battle.add_part_type(MapPartType::solid_block(vs)),
            left_wall: battle.add_part_type(MapPartType::left_wall(vs)),
            right_wall: battle.add_part_type(MapPartType::right_wall(vs)),
            lift: battle.add_part_type(MapPartType::lift()),
        };
        Self {
            battle,
            catalog,
            events: Vec::new(),
        }
    }

    /// A map with a floor on every tile of level 0.
    pub fn floored(x: i32, y: i32, z: i32) -> Self {
        let mut t = Self::new(x, y, z);
        t.floor_level(0);
        t
    }

    pub fn floor_level(&mut self, z: i32) {
        let [sx, sy, _] = self.battle.map().size();
        for y in 0..sy {
            for x in 0..sx {
                self.place(self.catalog.floor, TileCoord::new(x, y, z));
            }
        }
    }

    pub fn place(&mut self, part_type: MapPartTypeId, tile: TileCoord) -> MapPartId {
        self.battle
            .place_map_part(part_type, tile)
            .unwrap_or_else(|e| panic!("placing part at {tile}: {e}"))
    }

    pub fn spawn(&mut self, archetype: Archetype, tile: TileCoord) -> UnitId {
        self.battle
            .spawn_unit(archetype, tile)
            .unwrap_or_else(|e| panic!("spawning {archetype:?} at {tile}: {e}"))
    }

    /// Apply an action at the current tick and advance one tick.
    pub fn act(&mut self, action: BattleAction) {
        let cmd = BattleCommand {
            tick: self.battle.tick,
            action,
        };
        let target = self.battle.tick + 1;
        let result = self.battle.step(&[cmd], target);
        self.events.extend(result.events);
    }

    pub fn run(&mut self, ticks: u32) {
        let result = self.battle.update(ticks);
        self.events.extend(result.events);
    }

    /// Tick until every unit's queue is empty and nothing is in motion.
    /// Returns false if that did not happen within `SETTLE_LIMIT` ticks.
    pub fn settle(&mut self) -> bool {
        for _ in 0..SETTLE_LIMIT {
            if self.is_settled() {
                return true;
            }
            self.run(1);
        }
        let settled = self.is_settled();
        if !settled {
            log::warn!("battle did not settle within {SETTLE_LIMIT} ticks (tick {})", self.battle.tick);
        }
        settled
    }

    pub fn is_settled(&self) -> bool {
        self.battle
            .units
            .values()
            .all(|u| u.missions.is_empty() && u.movement.is_none() && !u.falling)
            && self.battle.projectiles.is_empty()
            && self.battle.items.values().all(|i| i.is_resting())
    }

    pub fn unit_tile(&self, id: UnitId) -> TileCoord {
        self.battle.unit(id).expect("unit exists").tile()
    }
}
