// Loose items: dropped or thrown equipment lying on the battlescape.
//
// An item is either resting, in flight (thrown along a shallow arc), or
// falling. Flight is swept against structural objects with `ray_collision`
// each tick; on a hit the item stops just short of the hit and falls. A
// falling item drops at the configured fall speed until it reaches a
// standable surface, then lands.
//
// See also: `battle.rs` for `drop_item` and throw handling,
// `mission.rs` for the throw mission that launches items.

use crate::object::TileObject;
use crate::tilemap::TileMap;
use crate::types::*;
use serde::{Deserialize, Serialize};

const ITEM_EXTENT: Extent = Extent::new(0.3, 0.3, 0.2);

/// Ticks of flight per tile of throw distance.
const FLIGHT_TICKS_PER_TILE: f32 = 2.0;

/// Arc peak height as a fraction of throw distance.
const ARC_HEIGHT: f32 = 0.25;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ItemFlight {
    pub from: WorldPos,
    pub to: WorldPos,
    pub elapsed: u32,
    pub duration: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BattleItem {
    pub id: ItemId,
    pub object: ObjectId,
    pub position: WorldPos,
    pub flight: Option<ItemFlight>,
    pub falling: bool,
}

impl BattleItem {
    pub fn new(id: ItemId, object: ObjectId, position: WorldPos) -> Self {
        Self {
            id,
            object,
            position,
            flight: None,
            falling: true,
        }
    }

    pub fn is_resting(&self) -> bool {
        self.flight.is_none() && !self.falling
    }

    pub fn launch(&mut self, from: WorldPos, to: WorldPos) {
        let duration = (from.distance(to) * FLIGHT_TICKS_PER_TILE).ceil() as u32;
        self.position = from;
        self.falling = false;
        self.flight = Some(ItemFlight {
            from,
            to,
            elapsed: 0,
            duration: duration.max(1),
        });
    }

    /// Advance flight or fall. Returns the tile the item landed on, if it
    /// landed during this update.
    pub fn update(&mut self, map: &mut TileMap, fall_speed: f32, ticks: u32) -> Option<TileCoord> {
        if let Some(flight) = self.flight.as_mut() {
            flight.elapsed = flight.elapsed.saturating_add(ticks).min(flight.duration);
            let t = flight.elapsed as f32 / flight.duration as f32;
            let lift = ARC_HEIGHT * flight.from.distance(flight.to) * 4.0 * t * (1.0 - t);
            let mut next = flight.from.lerp(flight.to, t);
            next.z += lift;
            let arrived = flight.elapsed >= flight.duration;

            let structure = ObjectKindSet::of(&[
                ObjectKind::Ground,
                ObjectKind::LeftWall,
                ObjectKind::RightWall,
                ObjectKind::Feature,
            ]);
            let blocked = map
                .ray_collision(self.position, next, structure, Some(self.object))
                .is_some();
            if blocked || arrived {
                self.flight = None;
                self.falling = true;
            }
            if !blocked {
                self.set_position(map, next);
            }
            return None;
        }

        if !self.falling {
            return None;
        }
        let mut pos = self.position;
        pos.z = (pos.z - fall_speed * ticks as f32).max(0.0);
        let tile = pos.tile();
        let rest = map.resting_position(tile, false);
        if (map.supports(tile, false) && pos.z <= rest.z) || pos.z <= 0.0 {
            pos.z = rest.z;
            self.set_position(map, pos);
            self.falling = false;
            return Some(tile);
        }
        self.set_position(map, pos);
        None
    }

    fn set_position(&mut self, map: &mut TileMap, position: WorldPos) {
        self.position = position;
        if map.move_object(self.object, position).is_none() {
            log::debug!("{}: map did not accept position {position}", self.id);
        }
    }
}

impl TileObject for BattleItem {
    fn object_id(&self) -> ObjectId {
        self.object
    }

    fn kind(&self) -> ObjectKind {
        ObjectKind::Item
    }

    fn position(&self) -> WorldPos {
        self.position
    }

    fn extent(&self) -> Extent {
        ITEM_EXTENT
    }
}
