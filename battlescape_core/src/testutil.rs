// Shared fixtures for unit tests: maps built from catalog parts.

use crate::config::TileMapConfig;
use crate::map_part::{MapPart, MapPartType};
use crate::tilemap::TileMap;
use crate::types::{MapPartId, MapPartTypeId, ObjectId, TileCoord};

pub(crate) const VOXELS: [i32; 3] = [24, 24, 20];

pub(crate) struct MapBuilder {
    pub map: TileMap,
    next: u32,
}

impl MapBuilder {
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self {
            map: TileMap::new(TileMapConfig::with_size(x, y, z)).unwrap(),
            next: 1000,
        }
    }

    /// A map with a floor on every z = 0 tile.
    pub fn floored(x: i32, y: i32, z: i32) -> Self {
        let mut b = Self::new(x, y, z);
        b.floor_level(0);
        b
    }

    pub fn floor_level(&mut self, z: i32) {
        let [sx, sy, _] = self.map.size();
        for y in 0..sy {
            for x in 0..sx {
                self.lay(&MapPartType::floor(VOXELS), TileCoord::new(x, y, z));
            }
        }
    }

    pub fn lay(&mut self, part_type: &MapPartType, tile: TileCoord) -> ObjectId {
        let object = ObjectId(self.next);
        self.next += 1;
        let part = MapPart {
            id: MapPartId(object.0),
            object,
            part_type: MapPartTypeId(0),
            tile,
        };
        self.map.insert(&part.placement(part_type));
        object
    }
}
