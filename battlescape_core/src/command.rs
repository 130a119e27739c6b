// Commands that drive units from outside the core.
//
// Players and AI both act by submitting `BattleCommand`s; the core treats
// them identically. A command carries the tick it applies at and a
// `BattleAction`. Unit-directed actions append (or, for cancellation, clear)
// missions on the unit's queue; the mission machine does the rest.
//
// See also: `battle.rs` for `Battle::step`, which sorts and applies
// commands, `mission.rs` for the missions each action becomes.
//
// **Critical constraint: determinism.** Commands are the sole external input
// to a battle. Within one tick they apply in submission order.

use crate::types::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BattleCommand {
    pub tick: u64,
    pub action: BattleAction,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum BattleAction {
    /// Walk (or fly) to a tile.
    MoveUnit { unit: UnitId, target: TileCoord },
    TurnUnit { unit: UnitId, facing: Facing },
    SetBodyState { unit: UnitId, state: BodyState },
    ThrowItem {
        unit: UnitId,
        item: ItemId,
        target: WorldPos,
    },
    /// Do nothing for a number of ticks.
    Snooze { unit: UnitId, ticks: u32 },
    /// Drop all queued missions; a step already under way is completed.
    CancelMissions { unit: UnitId },
    /// Start a new turn: refill every unit's time units.
    BeginTurn,
}

impl BattleAction {
    /// The unit this action is addressed to, if any.
    pub fn unit(&self) -> Option<UnitId> {
        match self {
            BattleAction::MoveUnit { unit, .. }
            | BattleAction::TurnUnit { unit, .. }
            | BattleAction::SetBodyState { unit, .. }
            | BattleAction::ThrowItem { unit, .. }
            | BattleAction::Snooze { unit, .. }
            | BattleAction::CancelMissions { unit } => Some(*unit),
            BattleAction::BeginTurn => None,
        }
    }
}
