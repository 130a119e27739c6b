// Voxel-precision ray collision against placed objects.
//
// `VoxelLine` walks the voxels crossed by a segment using the Amanatides &
// Woo 3D DDA, stepping one axis at a time so every voxel the segment passes
// through is visited in order from the start. `TileMap::ray_collision`
// converts a world segment into voxel space, and at each voxel tests the
// bodies of every eligible object intersecting that voxel's tile. The first
// solid bit in walk order wins; ties within one voxel go to the lowest
// object id.
//
// The query is pure: nothing on the map changes.
//
// See also: `voxel.rs` for `VoxelBody::get_bit`, `projectile.rs` for the
// main caller, `tilemap.rs` for the intersecting sets.

use crate::tilemap::TileMap;
use crate::types::{ObjectId, ObjectKind, ObjectKindSet, TileCoord, WorldPos};

/// Slack on the parametric end of the segment.
const T_EPSILON: f32 = 1e-6;

/// Clip the segment `from → to` to the box `[min, max]` (slab method).
/// Endpoints already inside the box are returned unchanged. `None` if the
/// segment misses the box.
pub fn clip_segment(
    from: [f32; 3],
    to: [f32; 3],
    min: [f32; 3],
    max: [f32; 3],
) -> Option<([f32; 3], [f32; 3])> {
    let mut t_enter = 0.0f32;
    let mut t_exit = 1.0f32;
    for axis in 0..3 {
        let d = to[axis] - from[axis];
        if d == 0.0 {
            if from[axis] < min[axis] || from[axis] > max[axis] {
                return None;
            }
            continue;
        }
        let (mut t0, mut t1) = ((min[axis] - from[axis]) / d, (max[axis] - from[axis]) / d);
        if t0 > t1 {
            std::mem::swap(&mut t0, &mut t1);
        }
        t_enter = t_enter.max(t0);
        t_exit = t_exit.min(t1);
        if t_enter > t_exit {
            return None;
        }
    }
    let at = |t: f32| std::array::from_fn(|a| from[a] + (to[a] - from[a]) * t);
    let start = if t_enter > 0.0 { at(t_enter) } else { from };
    let end = if t_exit < 1.0 { at(t_exit) } else { to };
    Some((start, end))
}

/// Iterator over the voxels crossed by a segment, in voxel units.
#[derive(Clone, Debug)]
pub struct VoxelLine {
    voxel: [i32; 3],
    end: [i32; 3],
    step: [i32; 3],
    t_max: [f32; 3],
    t_delta: [f32; 3],
    remaining: u32,
    done: bool,
}

impl VoxelLine {
    pub fn new(from: [f32; 3], to: [f32; 3]) -> Self {
        let dir = [to[0] - from[0], to[1] - from[1], to[2] - from[2]];
        let voxel = from.map(|v| v.floor() as i32);
        let end = to.map(|v| v.floor() as i32);

        let mut step = [0i32; 3];
        let mut t_max = [f32::INFINITY; 3];
        let mut t_delta = [f32::INFINITY; 3];
        for axis in 0..3 {
            if dir[axis] > 0.0 {
                step[axis] = 1;
                t_delta[axis] = 1.0 / dir[axis];
                t_max[axis] = ((voxel[axis] as f32 + 1.0) - from[axis]) / dir[axis];
            } else if dir[axis] < 0.0 {
                step[axis] = -1;
                t_delta[axis] = 1.0 / -dir[axis];
                t_max[axis] = (from[axis] - voxel[axis] as f32) / -dir[axis];
            }
        }

        // Every step moves one voxel along one axis, so the walk can never
        // need more than the Manhattan distance between the end voxels.
        // Float casts saturate, so the span is computed in i64.
        let span: u64 = (0..3)
            .map(|a| (i64::from(end[a]) - i64::from(voxel[a])).unsigned_abs())
            .sum();
        let remaining = u32::try_from(span.saturating_add(1)).unwrap_or(u32::MAX);

        Self {
            voxel,
            end,
            step,
            t_max,
            t_delta,
            remaining,
            done: false,
        }
    }
}

impl Iterator for VoxelLine {
    type Item = [i32; 3];

    fn next(&mut self) -> Option<[i32; 3]> {
        if self.done || self.remaining == 0 {
            return None;
        }
        let current = self.voxel;
        self.remaining -= 1;

        if current == self.end {
            self.done = true;
            return Some(current);
        }

        let axis = if self.t_max[0] <= self.t_max[1] && self.t_max[0] <= self.t_max[2] {
            0
        } else if self.t_max[1] <= self.t_max[2] {
            1
        } else {
            2
        };
        if self.t_max[axis] > 1.0 + T_EPSILON {
            self.done = true;
        } else {
            self.voxel[axis] += self.step[axis];
            self.t_max[axis] += self.t_delta[axis];
        }
        Some(current)
    }
}

/// The first solid voxel hit by a ray.
#[derive(Clone, Debug, PartialEq)]
pub struct Collision {
    pub object: ObjectId,
    pub kind: ObjectKind,
    pub tile: TileCoord,
    /// Global voxel coordinate of the hit.
    pub voxel: [i32; 3],
    /// World-space centre of the hit voxel.
    pub position: WorldPos,
}

impl TileMap {
    pub fn to_voxel_space(&self, p: WorldPos) -> [f32; 3] {
        let vs = self.voxel_size();
        [p.x * vs[0] as f32, p.y * vs[1] as f32, p.z * vs[2] as f32]
    }

    /// Walk from `start` to `end` and return the first solid voxel of an
    /// object whose kind is in `filter`, skipping `ignore`.
    pub fn ray_collision(
        &self,
        start: WorldPos,
        end: WorldPos,
        filter: ObjectKindSet,
        ignore: Option<ObjectId>,
    ) -> Option<Collision> {
        if !start.is_finite() || !end.is_finite() {
            log::warn!("ray {start} → {end} is not finite");
            return None;
        }
        let vs = self.voxel_size();
        let (from, to) = (self.to_voxel_space(start), self.to_voxel_space(end));
        if from.iter().chain(&to).any(|v| !v.is_finite()) {
            log::warn!("ray {start} → {end} overflows voxel space");
            return None;
        }
        let size = self.size();
        let bounds: [f32; 3] = std::array::from_fn(|a| (size[a] * vs[a]) as f32);
        let (from, to) = clip_segment(from, to, [0.0; 3], bounds)?;
        let line = VoxelLine::new(from, to);
        for voxel in line {
            let coord = TileCoord::new(
                voxel[0].div_euclid(vs[0]),
                voxel[1].div_euclid(vs[1]),
                voxel[2].div_euclid(vs[2]),
            );
            let Some(tile) = self.tile(coord) else {
                continue;
            };
            for &id in tile.intersecting() {
                if Some(id) == ignore {
                    continue;
                }
                let Some(object) = self.object(id) else {
                    continue;
                };
                if !filter.contains(object.kind) {
                    continue;
                }
                let Some(body) = &object.voxels else {
                    continue;
                };
                let origin = object.voxel_origin(vs);
                if body.get_bit(
                    voxel[0] - origin[0],
                    voxel[1] - origin[1],
                    voxel[2] - origin[2],
                ) {
                    return Some(Collision {
                        object: id,
                        kind: object.kind,
                        tile: coord,
                        voxel,
                        position: WorldPos::new(
                            (voxel[0] as f32 + 0.5) / vs[0] as f32,
                            (voxel[1] as f32 + 0.5) / vs[1] as f32,
                            (voxel[2] as f32 + 0.5) / vs[2] as f32,
                        ),
                    });
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TileMapConfig;
    use crate::object::TileObject;
    use crate::types::Extent;
    use crate::voxel::{VoxelBody, VoxelVolume};
    use std::sync::Arc;

    struct Block {
        id: u32,
        kind: ObjectKind,
        tile: TileCoord,
        body: Arc<VoxelBody>,
    }

    impl TileObject for Block {
        fn object_id(&self) -> ObjectId {
            ObjectId(self.id)
        }
        fn kind(&self) -> ObjectKind {
            self.kind
        }
        fn position(&self) -> WorldPos {
            self.tile.centre()
        }
        fn extent(&self) -> Extent {
            Extent::TILE
        }
        fn voxels(&self) -> Option<Arc<VoxelBody>> {
            Some(self.body.clone())
        }
    }

    /// A map with one feature at (2, 2, 0) whose only set bit is local
    /// (12, 12, 10), i.e. global voxel (60, 60, 10).
    fn single_bit_map() -> TileMap {
        let mut map = TileMap::new(TileMapConfig::with_size(5, 5, 2)).unwrap();
        let mut volume = VoxelVolume::new([24, 24, 20]);
        volume.set_bit(12, 12, 10, true);
        map.insert(&Block {
            id: 1,
            kind: ObjectKind::Feature,
            tile: TileCoord::new(2, 2, 0),
            body: Arc::new(VoxelBody::single(Arc::new(volume))),
        });
        map
    }

    fn voxel_centre(v: [i32; 3]) -> WorldPos {
        WorldPos::new(
            (v[0] as f32 + 0.5) / 24.0,
            (v[1] as f32 + 0.5) / 24.0,
            (v[2] as f32 + 0.5) / 20.0,
        )
    }

    #[test]
    fn line_visits_each_voxel_once_in_order() {
        let voxels: Vec<_> = VoxelLine::new([0.5, 0.5, 0.5], [3.5, 0.5, 0.5]).collect();
        assert_eq!(voxels, vec![[0, 0, 0], [1, 0, 0], [2, 0, 0], [3, 0, 0]]);

        let diag: Vec<_> = VoxelLine::new([0.2, 0.7, 0.5], [2.2, 2.7, 0.5]).collect();
        assert_eq!(diag.first(), Some(&[0, 0, 0]));
        assert_eq!(diag.last(), Some(&[2, 2, 0]));
        for pair in diag.windows(2) {
            let moved: i32 = (0..3).map(|a| (pair[1][a] - pair[0][a]).abs()).sum();
            assert_eq!(moved, 1, "steps are face-connected");
        }
    }

    #[test]
    fn far_endpoints_do_not_overflow() {
        let across = VoxelLine::new([1e30, 0.5, 0.5], [-1e30, 0.5, 0.5]);
        assert_eq!(across.remaining, u32::MAX);

        let line = VoxelLine::new([0.5, 0.5, 0.5], [-1e30, 0.5, 0.5]);
        assert_eq!(line.remaining, (1u32 << 31) + 1);
        let first: Vec<_> = line.take(3).collect();
        assert_eq!(first, vec![[0, 0, 0], [-1, 0, 0], [-2, 0, 0]]);
    }

    #[test]
    fn clip_keeps_inside_endpoints_and_trims_outside_ones() {
        let max = [120.0, 120.0, 40.0];
        let (a, b) = clip_segment([12.0, 12.0, 10.0], [60.0, 30.0, 20.0], [0.0; 3], max).unwrap();
        assert_eq!((a, b), ([12.0, 12.0, 10.0], [60.0, 30.0, 20.0]));

        let (a, b) = clip_segment([12.0, 12.0, 10.0], [2.4e8, 12.0, 10.0], [0.0; 3], max).unwrap();
        assert_eq!(a, [12.0, 12.0, 10.0]);
        assert!((b[0] - 120.0).abs() < 1e-2, "clipped to {b:?}");

        assert!(clip_segment([-5.0, 12.0, 10.0], [-1.0, 60.0, 10.0], [0.0; 3], max).is_none());
        assert!(clip_segment([12.0, 12.0, 50.0], [60.0, 30.0, 50.0], [0.0; 3], max).is_none());
    }

    #[test]
    fn far_ray_is_clipped_to_map() {
        let map = single_bit_map();
        let target = voxel_centre([60, 60, 10]);
        assert!(map
            .ray_collision(
                WorldPos::new(0.5, 0.5, 0.5),
                WorldPos::new(-1e9, 0.5, 0.5),
                ObjectKindSet::all(),
                None,
            )
            .is_none());
        let hit = map
            .ray_collision(
                WorldPos::new(0.1, target.y, target.z),
                WorldPos::new(1e9, target.y, target.z),
                ObjectKindSet::all(),
                None,
            )
            .expect("hit through a far endpoint");
        assert_eq!(hit.voxel, [60, 60, 10]);
        assert!(map
            .ray_collision(
                WorldPos::new(-1e9, -1e9, 5.0),
                WorldPos::new(1e9, 1e9, 5.0),
                ObjectKindSet::all(),
                None,
            )
            .is_none());
    }

    #[test]
    fn degenerate_line_yields_start() {
        let voxels: Vec<_> = VoxelLine::new([4.2, 1.1, 0.0], [4.7, 1.9, 0.3]).collect();
        assert_eq!(voxels, vec![[4, 1, 0]]);
    }

    #[test]
    fn ray_through_the_bit_hits() {
        let map = single_bit_map();
        let target = voxel_centre([60, 60, 10]);
        let hit = map
            .ray_collision(
                WorldPos::new(0.1, target.y, target.z),
                WorldPos::new(4.9, target.y, target.z),
                ObjectKindSet::all(),
                None,
            )
            .expect("hit");
        assert_eq!(hit.object, ObjectId(1));
        assert_eq!(hit.voxel, [60, 60, 10]);
        assert_eq!(hit.tile, TileCoord::new(2, 2, 0));
    }

    #[test]
    fn ray_beside_the_bit_misses() {
        let map = single_bit_map();
        let beside = voxel_centre([60, 61, 10]);
        assert!(map
            .ray_collision(
                WorldPos::new(0.1, beside.y, beside.z),
                WorldPos::new(4.9, beside.y, beside.z),
                ObjectKindSet::all(),
                None,
            )
            .is_none());
    }

    #[test]
    fn hit_iff_line_crosses_the_bit() {
        let map = single_bit_map();
        let target = voxel_centre([60, 60, 10]);
        let starts = [
            WorldPos::new(0.3, 0.3, 0.1),
            WorldPos::new(4.7, 0.2, 1.6),
            WorldPos::new(0.1, 4.9, 0.525),
            WorldPos::new(2.52, 2.52, 1.9),
        ];
        for start in starts {
            for end in [target, WorldPos::new(4.9, 4.9, 0.9), WorldPos::new(2.6, 2.4, 0.5)] {
                let crosses = VoxelLine::new(map.to_voxel_space(start), map.to_voxel_space(end))
                    .any(|v| v == [60, 60, 10]);
                let hit = map.ray_collision(start, end, ObjectKindSet::all(), None);
                assert_eq!(crosses, hit.is_some(), "{start} → {end}");
            }
        }
    }

    #[test]
    fn filter_and_ignore_skip_objects() {
        let map = single_bit_map();
        let t = voxel_centre([60, 60, 10]);
        let from = WorldPos::new(t.x, t.y, 0.01);
        let to = WorldPos::new(t.x, t.y, 1.9);
        assert!(map.ray_collision(from, to, ObjectKindSet::all(), None).is_some());
        assert!(map
            .ray_collision(
                from,
                to,
                ObjectKindSet::all().without(ObjectKind::Feature),
                None
            )
            .is_none());
        assert!(map
            .ray_collision(from, to, ObjectKindSet::all(), Some(ObjectId(1)))
            .is_none());
    }

    #[test]
    fn first_hit_in_walk_order() {
        let mut map = TileMap::new(TileMapConfig::with_size(6, 1, 1)).unwrap();
        let solid = Arc::new(VoxelBody::single(Arc::new(VoxelVolume::solid([24, 24, 20]))));
        for (id, x) in [(1, 4), (2, 2)] {
            map.insert(&Block {
                id,
                kind: ObjectKind::Feature,
                tile: TileCoord::new(x, 0, 0),
                body: solid.clone(),
            });
        }
        let hit = map
            .ray_collision(
                WorldPos::new(0.5, 0.5, 0.5),
                WorldPos::new(5.5, 0.5, 0.5),
                ObjectKindSet::all(),
                None,
            )
            .unwrap();
        assert_eq!(hit.object, ObjectId(2));
        assert_eq!(hit.voxel[0], 48);

        let back = map
            .ray_collision(
                WorldPos::new(5.5, 0.5, 0.5),
                WorldPos::new(0.5, 0.5, 0.5),
                ObjectKindSet::all(),
                None,
            )
            .unwrap();
        assert_eq!(back.object, ObjectId(1));
        assert_eq!(back.voxel[0], 119);
    }
}
