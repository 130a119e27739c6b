// Battle events: narrative output of the simulation.
//
// `Battle::step` and `Battle::update` return the events that happened during
// the ticks they processed. Events are observations for renderers, audio,
// and AI; nothing in the core reads them back.
//
// See also: `battle.rs` for the tick loop that collects events, `mission.rs`
// and `unit.rs` for most emitters.

use crate::types::*;
use serde::{Deserialize, Serialize};

/// A player-visible event that happened at a specific tick.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BattleEvent {
    pub tick: u64,
    pub kind: BattleEventKind,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum BattleEventKind {
    UnitSpawned { unit: UnitId, tile: TileCoord },
    /// A unit finished one step of movement.
    UnitStepped { unit: UnitId, tile: TileCoord },
    UnitTurned { unit: UnitId, facing: Facing },
    BodyStateChanged { unit: UnitId, state: BodyState },
    UnitLanded { unit: UnitId, tile: TileCoord },
    /// A goto mission gave up before reaching its target.
    GotoAbandoned { unit: UnitId, target: TileCoord },
    ItemThrown { unit: UnitId, item: ItemId },
    ItemLanded { item: ItemId, tile: TileCoord },
    ProjectileImpact {
        projectile: ProjectileId,
        object: ObjectId,
        kind: ObjectKind,
        position: WorldPos,
    },
    ProjectileExpired { projectile: ProjectileId },
    EffectExpired { effect: EffectId },
    MapPartDestroyed { part: MapPartId },
    UnitRemoved { unit: UnitId },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_serialization_roundtrip() {
        let event = BattleEvent {
            tick: 42,
            kind: BattleEventKind::ProjectileImpact {
                projectile: ProjectileId(3),
                object: ObjectId(17),
                kind: ObjectKind::LeftWall,
                position: WorldPos::new(1.5, 2.25, 0.5),
            },
        };
        let json = serde_json::to_string(&event).unwrap();
        let restored: BattleEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(event, restored);
    }
}
