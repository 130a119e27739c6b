// Data-driven battle configuration.
//
// All tunable battlescape parameters live in `BattleConfig`, loadable from
// JSON. The core reads thresholds, costs, and limits from here rather than
// from constants, so balance can be iterated without recompiling.
//
// Parameters are grouped by the component that consumes them:
// `TileMapConfig` (grid extent, voxel resolution, draw layers) with its nested
// `MovementRules` (traversal costs and thresholds, path search budget), and
// `MissionRules` (replan and prerequisite bounds, fall speed). Per-archetype
// mover data lives in `UnitProfile` entries keyed by `Archetype` in
// `unit_profiles`; see `profile.rs`.
//
// See also: `tilemap.rs` which takes a `TileMapConfig` at construction,
// `passability.rs` for the consumer of `MovementRules`, `unit.rs` for
// `MissionRules`, `battle.rs` which owns the `BattleConfig`.
//
// **Critical constraint: determinism.** Config values feed directly into
// traversal and mission logic; identical configs give identical battles.

use crate::error::{BattleError, BattleResult};
use crate::profile::UnitProfile;
use crate::types::{Archetype, Extent, ObjectKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// Movement rules
// ---------------------------------------------------------------------------

/// Traversal cost model and search budget.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MovementRules {
    /// Movement or wall-crossing cost at or above which a tile or face cannot
    /// be entered.
    pub impassable_cost: u8,

    /// Floor applied to every step's raw cost.
    pub base_move_cost: u8,

    /// Divisor turning raw cost into tile units (one orthogonal step on
    /// plain ground costs `base_move_cost / cost_scale`).
    pub cost_scale: f32,

    /// Minimum height of the current tile's surface (0..1) before a
    /// non-flyer may step up into the next level.
    pub ascend_height_threshold: f32,

    /// Extra cost a flyer pays per step that ends off the ground.
    pub unsupported_flight_penalty: f32,

    /// Default expansion budget for one path search.
    pub path_iteration_limit: u32,
}

impl Default for MovementRules {
    fn default() -> Self {
        Self {
            impassable_cost: 255,
            base_move_cost: 4,
            cost_scale: 4.0,
            ascend_height_threshold: 0.625,
            unsupported_flight_penalty: 0.25,
            path_iteration_limit: 2000,
        }
    }
}

// ---------------------------------------------------------------------------
// Tile map
// ---------------------------------------------------------------------------

/// Grid extent, voxel resolution, and draw-layer assignment.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TileMapConfig {
    /// Map dimensions in tiles (x, y, z).
    pub size: [i32; 3],

    /// Voxels per tile on each axis. Ray collision walks at this resolution.
    pub voxel_size: [i32; 3],

    /// Number of per-tile draw lists.
    pub layer_count: usize,

    /// Draw list for each object kind.
    pub layer_map: BTreeMap<ObjectKind, usize>,

    /// Depth-key weights: `depth = x·sx + y·sy + z·sz`.
    pub draw_scale: [f32; 3],

    pub movement: MovementRules,
}

impl TileMapConfig {
    /// A config of the given size with every other field at its default.
    pub fn with_size(x: i32, y: i32, z: i32) -> Self {
        Self {
            size: [x, y, z],
            ..Self::default()
        }
    }

    /// Reject configs the map cannot be built from.
    pub fn validate(&self) -> BattleResult<()> {
        let [x, y, z] = self.size;
        if x <= 0 || y <= 0 || z <= 0 {
            return Err(BattleError::InvalidDimensions { x, y, z });
        }
        if self.voxel_size.iter().any(|&v| v <= 0) {
            return Err(BattleError::InvalidVoxelSize(self.voxel_size));
        }
        // Flat tile indices and voxel coordinates are both i32.
        let limit = i64::from(i32::MAX);
        let tiles = i64::from(x) * i64::from(y) * i64::from(z);
        let voxels_fit =
            (0..3).all(|a| i64::from(self.size[a]) * i64::from(self.voxel_size[a]) <= limit);
        if tiles > limit || !voxels_fit {
            return Err(BattleError::MapTooLarge {
                x,
                y,
                z,
                voxel_size: self.voxel_size,
            });
        }
        self.movement.validate()?;
        for kind in ObjectKind::ALL {
            let layer = *self
                .layer_map
                .get(&kind)
                .ok_or(BattleError::MissingLayer(kind))?;
            if layer >= self.layer_count {
                return Err(BattleError::LayerOutOfRange {
                    kind,
                    layer,
                    count: self.layer_count,
                });
            }
        }
        Ok(())
    }

    pub fn tile_count(&self) -> usize {
        let [x, y, z] = self.size;
        (x.max(0) as usize) * (y.max(0) as usize) * (z.max(0) as usize)
    }
}

impl MovementRules {
    /// Costs are divided by `cost_scale` and every float feeds path costs.
    pub fn validate(&self) -> BattleResult<()> {
        let rules = [
            ("cost_scale", self.cost_scale, self.cost_scale > 0.0),
            ("ascend_height_threshold", self.ascend_height_threshold, true),
            (
                "unsupported_flight_penalty",
                self.unsupported_flight_penalty,
                self.unsupported_flight_penalty >= 0.0,
            ),
        ];
        for (rule, value, in_range) in rules {
            if !value.is_finite() || !in_range {
                return Err(BattleError::InvalidMovementRule { rule, value });
            }
        }
        Ok(())
    }
}

impl Default for TileMapConfig {
    fn default() -> Self {
        let layer_map = ObjectKind::ALL
            .into_iter()
            .map(|kind| {
                let layer = match kind {
                    ObjectKind::Ground => 0,
                    ObjectKind::LeftWall | ObjectKind::RightWall => 1,
                    _ => 2,
                };
                (kind, layer)
            })
            .collect();
        Self {
            size: [40, 40, 4],
            voxel_size: [24, 24, 20],
            layer_count: 3,
            layer_map,
            draw_scale: [1.0, 1.0, 2.0],
            movement: MovementRules::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Mission rules
// ---------------------------------------------------------------------------

/// Bounds on the per-unit mission machine.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MissionRules {
    /// How many times a goto mission may discard its plan and search again
    /// before giving up.
    pub max_replans: u32,

    /// Maximum nesting of prerequisite missions pushed in front of a parent.
    pub max_prerequisite_depth: u32,

    /// Vertical speed of an uncontrolled fall.
    pub fall_tiles_per_tick: f32,

    /// Upper bound on mission starts/finishes processed for one unit in one
    /// update call. Missions that finish immediately on start would otherwise
    /// chain without bound.
    pub max_steps_per_update: u32,
}

impl Default for MissionRules {
    fn default() -> Self {
        Self {
            max_replans: 5,
            max_prerequisite_depth: 8,
            fall_tiles_per_tick: 0.25,
            max_steps_per_update: 16,
        }
    }
}

// ---------------------------------------------------------------------------
// Top-level battle config
// ---------------------------------------------------------------------------

/// Top-level battle configuration. Loaded once, never mutated mid-battle.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BattleConfig {
    pub map: TileMapConfig,

    pub missions: MissionRules,

    /// Per-archetype mover data, keyed by `Archetype`.
    pub unit_profiles: BTreeMap<Archetype, UnitProfile>,
}

impl BattleConfig {
    pub fn from_json(json: &str) -> BattleResult<Self> {
        let config: BattleConfig = serde_json::from_str(json)?;
        config.map.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> BattleResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn profile(&self, archetype: Archetype) -> BattleResult<&UnitProfile> {
        self.unit_profiles
            .get(&archetype)
            .ok_or(BattleError::MissingProfile(archetype))
    }
}

impl Default for BattleConfig {
    fn default() -> Self {
        let mut unit_profiles = BTreeMap::new();
        unit_profiles.insert(
            Archetype::Agent,
            UnitProfile {
                large: false,
                can_fly: false,
                extent: Extent::new(0.5, 0.5, 0.9),
                ticks_per_tile: 8,
                turn_ticks: 2,
                stance_change_ticks: 4,
                throw_ticks: 6,
                max_time_units: 60,
                time_units_per_tile: 4,
                time_units_per_turn: 1,
                throw_time_units: 20,
                max_health: 35,
            },
        );
        unit_profiles.insert(
            Archetype::Brainsucker,
            UnitProfile {
                large: false,
                can_fly: false,
                extent: Extent::new(0.4, 0.4, 0.4),
                ticks_per_tile: 5,
                turn_ticks: 1,
                stance_change_ticks: 2,
                throw_ticks: 6,
                max_time_units: 80,
                time_units_per_tile: 3,
                time_units_per_turn: 1,
                throw_time_units: 20,
                max_health: 20,
            },
        );
        unit_profiles.insert(
            Archetype::Skeletoid,
            UnitProfile {
                large: false,
                can_fly: true,
                extent: Extent::new(0.5, 0.5, 0.95),
                ticks_per_tile: 7,
                turn_ticks: 2,
                stance_change_ticks: 6,
                throw_ticks: 6,
                max_time_units: 70,
                time_units_per_tile: 4,
                time_units_per_turn: 1,
                throw_time_units: 20,
                max_health: 50,
            },
        );
        unit_profiles.insert(
            Archetype::Megaspawn,
            UnitProfile {
                large: true,
                can_fly: false,
                extent: Extent::new(1.0, 1.0, 1.0),
                ticks_per_tile: 12,
                turn_ticks: 4,
                stance_change_ticks: 8,
                throw_ticks: 10,
                max_time_units: 50,
                time_units_per_tile: 6,
                time_units_per_turn: 2,
                throw_time_units: 30,
                max_health: 120,
            },
        );

        Self {
            map: TileMapConfig::default(),
            missions: MissionRules::default(),
            unit_profiles,
        }
    }
}
