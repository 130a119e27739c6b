// Unit profiles: data-driven mover capabilities.
//
// Every behavioural difference between unit archetypes (soldiers, small
// aliens, flyers, large multi-tile creatures) is expressed as data in
// `UnitProfile`, keyed by `Archetype` in the battle config. `BattleUnit` is a
// single type that reads its capabilities from the profile table at spawn
// time, so no code branches on the archetype itself.
//
// See also: `config.rs` where the profile table lives, `unit.rs` for the
// `BattleUnit` that consumes this data, `passability.rs` for how `large` and
// `can_fly` shape traversal.
//
// **Critical constraint: determinism.** Profiles are part of the battle
// config and must be identical for identical results.

use crate::types::Extent;
use serde::{Deserialize, Serialize};

/// Data-driven movement and timing parameters for a unit archetype.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UnitProfile {
    /// Occupies a 2×2 footprint over two z-levels instead of a single tile.
    pub large: bool,

    /// May enter tiles without a standable surface.
    pub can_fly: bool,

    /// Bounding box of one body segment, in tile units. Large units stack
    /// eight segments of this size.
    pub extent: Extent,

    /// Ticks to walk one orthogonal tile at unit traversal cost.
    pub ticks_per_tile: u32,

    /// Ticks per 45° of rotation.
    pub turn_ticks: u32,

    /// Ticks to switch body state (kneel, stand, take off).
    pub stance_change_ticks: u32,

    /// Ticks for the throwing animation before an item leaves the hand.
    pub throw_ticks: u32,

    /// Time units restored at the start of each turn in turn-based mode.
    pub max_time_units: u32,

    /// Time units spent per tile, scaled by traversal cost.
    pub time_units_per_tile: u32,

    /// Time units spent per 45° turn.
    pub time_units_per_turn: u32,

    /// Time units spent per throw.
    pub throw_time_units: u32,

    pub max_health: u32,
}

impl UnitProfile {
    /// Time units for a step whose policy cost is `cost`, never less than one.
    pub fn step_time_units(&self, cost: f32) -> u32 {
        ((self.time_units_per_tile as f32 * cost).ceil() as u32).max(1)
    }

    /// Ticks for a step whose policy cost is `cost`. Free steps (controlled
    /// falls) still take a quarter tile so motion stays visible.
    pub fn step_ticks(&self, cost: f32) -> u32 {
        ((self.ticks_per_tile as f32 * cost.max(0.25)).ceil() as u32).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn walker() -> UnitProfile {
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
            max_health: 30,
        }
    }

    #[test]
    fn free_steps_still_take_time() {
        let p = walker();
        assert_eq!(p.step_ticks(0.0), 2);
        assert_eq!(p.step_ticks(1.0), 8);
        assert_eq!(p.step_ticks(1.5), 12);
    }

    #[test]
    fn time_units_round_up() {
        let p = walker();
        assert_eq!(p.step_time_units(1.0), 4);
        assert_eq!(p.step_time_units(1.1), 5);
        assert_eq!(p.step_time_units(0.0), 1);
    }
}
