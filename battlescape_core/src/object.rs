// Objects that can be placed on the tile map.
//
// Entities (map parts, units, items, projectiles, effects) implement the
// narrow `TileObject` trait: identity, kind, anchor position, bounding
// extent, and optionally a voxel body and structural properties. The map
// never sees concrete entity types.
//
// When an object is inserted, the map copies what it needs into a
// `PlacedObject` record keyed by `ObjectId`. The record also holds the
// back-references (owning tile, intersecting tiles), which only `TileMap`
// mutates. Entities keep their `ObjectId` and must remove it from the map
// before they are dropped.
//
// See also: `tilemap.rs` for insert/remove/move, `tile.rs` for how
// structural properties become cached traversal fields.

use crate::types::{Anchor, Extent, ObjectId, ObjectKind, TileIndex, WorldPos};
use crate::voxel::VoxelBody;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::sync::Arc;

/// Traversal-relevant properties of ground, walls, and features.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct StructureProps {
    /// Cost to enter the tile (ground/feature) or to cross the wall
    /// (left/right wall). 0–254, 255 impassable.
    pub movement_cost: u8,
    /// Height of the standing surface within the tile, 0.0–1.0. A value of
    /// 1.0 makes the tile above standable.
    pub height: f32,
    /// Provides a floor at the bottom of the tile.
    pub floor: bool,
    /// Lets units move vertically through the tile.
    pub lift: bool,
}

impl StructureProps {
    pub const fn open(movement_cost: u8) -> Self {
        Self {
            movement_cost,
            height: 0.0,
            floor: false,
            lift: false,
        }
    }
}

/// Contract between game entities and the tile map.
pub trait TileObject {
    fn object_id(&self) -> ObjectId;

    fn kind(&self) -> ObjectKind;

    /// Anchor position: the foot for units and items, the centre otherwise.
    fn position(&self) -> WorldPos;

    fn extent(&self) -> Extent;

    /// Collision body, for kinds that take part in ray collision.
    fn voxels(&self) -> Option<Arc<VoxelBody>> {
        None
    }

    fn structure(&self) -> Option<StructureProps> {
        None
    }
}

/// The map's record of one placed object.
#[derive(Clone, Debug)]
pub struct PlacedObject {
    pub id: ObjectId,
    pub kind: ObjectKind,
    pub position: WorldPos,
    pub extent: Extent,
    pub voxels: Option<Arc<VoxelBody>>,
    pub structure: Option<StructureProps>,
    pub(crate) owner: Option<TileIndex>,
    pub(crate) intersecting: SmallVec<[TileIndex; 8]>,
}

impl PlacedObject {
    pub fn from_object(object: &impl TileObject) -> Self {
        Self {
            id: object.object_id(),
            kind: object.kind(),
            position: object.position(),
            extent: object.extent(),
            voxels: object.voxels(),
            structure: object.structure(),
            owner: None,
            intersecting: SmallVec::new(),
        }
    }

    pub fn owner(&self) -> Option<TileIndex> {
        self.owner
    }

    pub fn intersecting(&self) -> &[TileIndex] {
        &self.intersecting
    }

    /// Axis-aligned bounds `(min, max)` in world space.
    pub fn bounds(&self) -> (WorldPos, WorldPos) {
        let half = WorldPos::new(self.extent.x / 2.0, self.extent.y / 2.0, self.extent.z / 2.0);
        match self.kind.anchor() {
            Anchor::Centre => (self.position - half, self.position + half),
            Anchor::Foot => {
                let min = WorldPos::new(
                    self.position.x - half.x,
                    self.position.y - half.y,
                    self.position.z,
                );
                let max = WorldPos::new(
                    self.position.x + half.x,
                    self.position.y + half.y,
                    self.position.z + self.extent.z,
                );
                (min, max)
            }
        }
    }

    /// Global voxel coordinate of the body's local origin.
    pub fn voxel_origin(&self, voxel_size: [i32; 3]) -> [i32; 3] {
        let (min, _) = self.bounds();
        let min = min.to_array();
        [0, 1, 2].map(|axis| (min[axis] * voxel_size[axis] as f32).round() as i32)
    }

    /// World-space point to aim at: the body's approximate centre, or the
    /// bounds centre for objects without a body.
    pub fn aim_point(&self, voxel_size: [i32; 3]) -> WorldPos {
        let (min, max) = self.bounds();
        match &self.voxels {
            Some(body) => {
                let origin = self.voxel_origin(voxel_size);
                let c = body.centre();
                let p = [0, 1, 2].map(|a| (origin[a] as f32 + c[a]) / voxel_size[a] as f32);
                WorldPos::new(p[0], p[1], p[2])
            }
            None => min.lerp(max, 0.5),
        }
    }

    /// Draw-order depth key.
    pub fn depth(&self, scale: [f32; 3]) -> f32 {
        self.position.x * scale[0] + self.position.y * scale[1] + self.position.z * scale[2]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::voxel::VoxelVolume;

    struct Crate {
        kind: ObjectKind,
        position: WorldPos,
    }

    impl TileObject for Crate {
        fn object_id(&self) -> ObjectId {
            ObjectId(1)
        }
        fn kind(&self) -> ObjectKind {
            self.kind
        }
        fn position(&self) -> WorldPos {
            self.position
        }
        fn extent(&self) -> Extent {
            Extent::new(0.5, 0.5, 1.0)
        }
        fn voxels(&self) -> Option<Arc<VoxelBody>> {
            Some(Arc::new(VoxelBody::single(Arc::new(VoxelVolume::solid([
                12, 12, 20,
            ])))))
        }
    }

    #[test]
    fn centre_anchored_bounds() {
        let placed = PlacedObject::from_object(&Crate {
            kind: ObjectKind::Feature,
            position: WorldPos::new(2.5, 2.5, 0.5),
        });
        let (min, max) = placed.bounds();
        assert_eq!(min, WorldPos::new(2.25, 2.25, 0.0));
        assert_eq!(max, WorldPos::new(2.75, 2.75, 1.0));
    }

    #[test]
    fn foot_anchored_bounds_start_at_position() {
        let placed = PlacedObject::from_object(&Crate {
            kind: ObjectKind::Unit,
            position: WorldPos::new(2.5, 2.5, 1.0),
        });
        let (min, max) = placed.bounds();
        assert_eq!(min.z, 1.0);
        assert_eq!(max.z, 2.0);
        assert_eq!(placed.voxel_origin([24, 24, 20]), [54, 54, 20]);
    }

    #[test]
    fn aim_point_uses_body_centre() {
        let placed = PlacedObject::from_object(&Crate {
            kind: ObjectKind::Unit,
            position: WorldPos::new(2.5, 2.5, 1.0),
        });
        let aim = placed.aim_point([24, 24, 20]);
        assert!((aim.x - 2.5).abs() < 1e-5);
        assert!((aim.z - 1.5).abs() < 1e-5);
    }
}
