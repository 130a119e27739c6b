// Transient visual effects (smoke, fire, explosions) placed on the map.
//
// Effects occupy tiles for drawing and lookups but have no voxel body, so
// rays pass through them. Each one counts down a lifetime and is removed by
// `Battle` when it expires.

use crate::object::TileObject;
use crate::types::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Effect {
    pub id: EffectId,
    pub object: ObjectId,
    pub position: WorldPos,
    pub extent: Extent,
    pub remaining: u32,
}

impl Effect {
    /// Count down the lifetime. Returns true once expired.
    pub fn update(&mut self, ticks: u32) -> bool {
        self.remaining = self.remaining.saturating_sub(ticks);
        self.remaining == 0
    }
}

impl TileObject for Effect {
    fn object_id(&self) -> ObjectId {
        self.object
    }

    fn kind(&self) -> ObjectKind {
        ObjectKind::Effect
    }

    fn position(&self) -> WorldPos {
        self.position
    }

    fn extent(&self) -> Extent {
        self.extent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effect_expires_after_lifetime() {
        let mut smoke = Effect {
            id: EffectId(1),
            object: ObjectId(5),
            position: WorldPos::new(1.5, 1.5, 0.5),
            extent: Extent::TILE,
            remaining: 3,
        };
        assert!(!smoke.update(2));
        assert!(smoke.update(2));
        assert!(smoke.update(1));
    }
}
