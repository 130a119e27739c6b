// Map parts: the static scenery of a battle (floors, walls, features).
//
// A `MapPartType` is a catalog entry: object kind, structural properties,
// and a shared voxel body. A `MapPart` is one placed instance referring to
// its type by `MapPartTypeId`. Parts are placed on the map through
// `MapPart::placement`, which pairs the instance with its type and
// implements `TileObject`.
//
// Walls live in the tile whose face they occupy: a left wall sits on the
// tile's west face (its body is a slab at local x = 0), a right wall on the
// north face (slab at local y = 0).
//
// See also: `battle.rs` which owns the catalog and the placed parts,
// `tile.rs` for how `StructureProps` become traversal caches.

use crate::object::{StructureProps, TileObject};
use crate::types::{Extent, MapPartId, MapPartTypeId, ObjectId, ObjectKind, TileCoord, WorldPos};
use crate::voxel::{VoxelBody, VoxelVolume};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Thickness of wall slabs, in voxels.
const WALL_THICKNESS: i32 = 2;

/// A catalog entry describing one kind of scenery.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MapPartType {
    pub name: String,
    pub kind: ObjectKind,
    pub structure: StructureProps,
    pub body: Option<Arc<VoxelBody>>,
    /// Damage from a single hit that destroys the part; `None` is
    /// indestructible.
    #[serde(default)]
    pub strength: Option<u32>,
}

impl MapPartType {
    fn new(name: &str, kind: ObjectKind, structure: StructureProps, volume: Option<VoxelVolume>) -> Self {
        Self {
            name: name.to_owned(),
            kind,
            structure,
            body: volume.map(|v| Arc::new(VoxelBody::single(Arc::new(v)))),
            strength: None,
        }
    }

    /// One-voxel floor slab.
    pub fn floor(voxel_size: [i32; 3]) -> Self {
        Self::new(
            "floor",
            ObjectKind::Ground,
            StructureProps {
                movement_cost: 4,
                height: 0.0,
                floor: true,
                lift: false,
            },
            Some(VoxelVolume::solid_layers(voxel_size, 0, 1)),
        )
    }

    /// Raised floor; `height` is the fraction of the tile filled.
    pub fn stairs(voxel_size: [i32; 3], height: f32) -> Self {
        let top = (voxel_size[2] as f32 * height).round() as i32;
        Self::new(
            "stairs",
            ObjectKind::Ground,
            StructureProps {
                movement_cost: 8,
                height,
                floor: true,
                lift: false,
            },
            Some(VoxelVolume::solid_layers(voxel_size, 0, top.max(1))),
        )
    }

    /// Impassable full-tile block. Its top supports the tile above.
    pub fn solid_block(voxel_size: [i32; 3]) -> Self {
        Self::new(
            "solid block",
            ObjectKind::Feature,
            StructureProps {
                movement_cost: 255,
                height: 1.0,
                floor: true,
                lift: false,
            },
            Some(VoxelVolume::solid(voxel_size)),
        )
    }

    /// Lift shaft segment; units move vertically between stacked lifts.
    pub fn lift() -> Self {
        Self::new(
            "lift",
            ObjectKind::Feature,
            StructureProps {
                movement_cost: 4,
                height: 0.0,
                floor: false,
                lift: true,
            },
            None,
        )
    }

    /// Impassable wall on the tile's west face.
    pub fn left_wall(voxel_size: [i32; 3]) -> Self {
        let mut volume = VoxelVolume::new(voxel_size);
        for z in 0..voxel_size[2] {
            for y in 0..voxel_size[1] {
                for x in 0..WALL_THICKNESS.min(voxel_size[0]) {
                    volume.set_bit(x, y, z, true);
                }
            }
        }
        Self::new("left wall", ObjectKind::LeftWall, StructureProps::open(255), Some(volume))
    }

    /// Impassable wall on the tile's north face.
    pub fn right_wall(voxel_size: [i32; 3]) -> Self {
        let mut volume = VoxelVolume::new(voxel_size);
        for z in 0..voxel_size[2] {
            for y in 0..WALL_THICKNESS.min(voxel_size[1]) {
                for x in 0..voxel_size[0] {
                    volume.set_bit(x, y, z, true);
                }
            }
        }
        Self::new("right wall", ObjectKind::RightWall, StructureProps::open(255), Some(volume))
    }

    /// Same part with a different movement (or crossing) cost, e.g. a low
    /// fence built from a wall type.
    pub fn with_movement_cost(mut self, cost: u8) -> Self {
        self.structure.movement_cost = cost;
        self
    }

    pub fn with_strength(mut self, strength: u32) -> Self {
        self.strength = Some(strength);
        self
    }

    pub fn named(mut self, name: &str) -> Self {
        self.name = name.to_owned();
        self
    }
}

/// One placed piece of scenery.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MapPart {
    pub id: MapPartId,
    pub object: ObjectId,
    pub part_type: MapPartTypeId,
    pub tile: TileCoord,
}

impl MapPart {
    pub fn placement<'a>(&'a self, part_type: &'a MapPartType) -> PlacedPart<'a> {
        PlacedPart {
            part: self,
            part_type,
        }
    }
}

/// A part paired with its catalog entry, as seen by the tile map.
pub struct PlacedPart<'a> {
    part: &'a MapPart,
    part_type: &'a MapPartType,
}

impl TileObject for PlacedPart<'_> {
    fn object_id(&self) -> ObjectId {
        self.part.object
    }

    fn kind(&self) -> ObjectKind {
        self.part_type.kind
    }

    fn position(&self) -> WorldPos {
        self.part.tile.centre()
    }

    fn extent(&self) -> Extent {
        Extent::TILE
    }

    fn voxels(&self) -> Option<Arc<VoxelBody>> {
        self.part_type.body.clone()
    }

    fn structure(&self) -> Option<StructureProps> {
        Some(self.part_type.structure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VS: [i32; 3] = [24, 24, 20];

    #[test]
    fn floor_is_a_bottom_slab() {
        let floor = MapPartType::floor(VS);
        let body = floor.body.unwrap();
        assert!(body.get_bit(10, 10, 0));
        assert!(!body.get_bit(10, 10, 1));
        assert!(floor.structure.floor);
    }

    #[test]
    fn lift_is_an_open_shaft() {
        let lift = MapPartType::lift();
        assert!(lift.body.is_none());
        assert!(lift.structure.lift);
        assert!(!lift.structure.floor);
        assert_eq!(lift.kind, ObjectKind::Feature);
    }

    #[test]
    fn walls_occupy_their_face() {
        let left = MapPartType::left_wall(VS).body.unwrap();
        assert!(left.get_bit(0, 12, 10));
        assert!(left.get_bit(1, 12, 10));
        assert!(!left.get_bit(2, 12, 10));
        let right = MapPartType::right_wall(VS).body.unwrap();
        assert!(right.get_bit(12, 1, 10));
        assert!(!right.get_bit(12, 2, 10));
    }

    #[test]
    fn stairs_fill_to_height() {
        let stairs = MapPartType::stairs(VS, 0.75);
        let body = stairs.body.unwrap();
        assert!(body.get_bit(0, 0, 14));
        assert!(!body.get_bit(0, 0, 15));
    }

    #[test]
    fn fence_from_wall() {
        let fence = MapPartType::left_wall(VS).with_movement_cost(24).named("fence");
        assert_eq!(fence.structure.movement_cost, 24);
        assert_eq!(fence.name, "fence");
        assert_eq!(fence.kind, ObjectKind::LeftWall);
    }

    #[test]
    fn placement_exposes_type_data() {
        let ty = MapPartType::solid_block(VS);
        let part = MapPart {
            id: MapPartId(0),
            object: ObjectId(9),
            part_type: MapPartTypeId(0),
            tile: TileCoord::new(1, 2, 0),
        };
        let placed = part.placement(&ty);
        assert_eq!(placed.object_id(), ObjectId(9));
        assert_eq!(placed.kind(), ObjectKind::Feature);
        assert_eq!(placed.position(), WorldPos::new(1.5, 2.5, 0.5));
        assert_eq!(placed.structure().unwrap().movement_cost, 255);
        assert!(placed.voxels().is_some());
    }
}
