// Sub-tile voxel volumes: the atomic collision primitive.
//
// A `VoxelVolume` is a fixed-size 3D bit volume stored as a stack of
// bit-packed `VoxelSlice`s along local z. Slices that were never written are
// `None` and read as empty. All reads are bounds-checked: anything outside
// the declared size is "not solid", never an error.
//
// Bodies larger than one volume (a large unit spanning 2×2 tiles and two
// levels) are a `VoxelBody`: a small grid of volumes addressed by first
// resolving which sub-volume a local voxel falls into, then the coordinate
// within it. Volumes are shared through `Arc` so every placement of the same
// map part type reuses one volume.
//
// See also: `collision.rs` for the ray walk that reads these bits,
// `map_part.rs` for the part catalog that builds volumes, `unit.rs` for
// unit bodies.
//
// **Critical constraint: determinism.** No floating-point state is stored
// except the cached centre, which is derived purely from the bits.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, OnceLock};

// ---------------------------------------------------------------------------
// Slices
// ---------------------------------------------------------------------------

/// A 2D bit plane, row-major, 64 bits per word.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoxelSlice {
    width: i32,
    height: i32,
    bits: Vec<u64>,
}

impl VoxelSlice {
    pub fn new(width: i32, height: i32) -> Self {
        let cells = (width.max(0) as usize) * (height.max(0) as usize);
        Self {
            width: width.max(0),
            height: height.max(0),
            bits: vec![0; cells.div_ceil(64)],
        }
    }

    pub fn filled(width: i32, height: i32) -> Self {
        let mut slice = Self::new(width, height);
        for y in 0..slice.height {
            for x in 0..slice.width {
                slice.set_bit(x, y, true);
            }
        }
        slice
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    fn index(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 || x >= self.width || y >= self.height {
            return None;
        }
        Some(y as usize * self.width as usize + x as usize)
    }

    pub fn get_bit(&self, x: i32, y: i32) -> bool {
        self.index(x, y)
            .is_some_and(|i| self.bits[i / 64] & (1 << (i % 64)) != 0)
    }

    /// Returns false (and does nothing) if `(x, y)` is outside the slice.
    pub fn set_bit(&mut self, x: i32, y: i32, value: bool) -> bool {
        let Some(i) = self.index(x, y) else {
            return false;
        };
        let mask = 1u64 << (i % 64);
        if value {
            self.bits[i / 64] |= mask;
        } else {
            self.bits[i / 64] &= !mask;
        }
        true
    }

    pub fn is_empty(&self) -> bool {
        self.bits.iter().all(|&w| w == 0)
    }

    pub fn count(&self) -> u32 {
        self.bits.iter().map(|w| w.count_ones()).sum()
    }
}

// ---------------------------------------------------------------------------
// Volumes
// ---------------------------------------------------------------------------

/// A fixed-size 3D bit volume. Size never changes after construction.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VoxelVolume {
    size: [i32; 3],
    slices: Vec<Option<VoxelSlice>>,
    #[serde(skip)]
    centre: OnceLock<[f32; 3]>,
}

impl VoxelVolume {
    /// An empty volume; every slice starts missing.
    pub fn new(size: [i32; 3]) -> Self {
        let size = size.map(|s| s.max(0));
        Self {
            size,
            slices: vec![None; size[2] as usize],
            centre: OnceLock::new(),
        }
    }

    /// A volume with every bit set.
    pub fn solid(size: [i32; 3]) -> Self {
        let mut volume = Self::new(size);
        for z in 0..volume.size[2] {
            volume.slices[z as usize] = Some(VoxelSlice::filled(volume.size[0], volume.size[1]));
        }
        volume
    }

    /// A volume solid in the local z range `[z_min, z_max)` and empty
    /// elsewhere. Floors, ramps, and wall stubs are built this way.
    pub fn solid_layers(size: [i32; 3], z_min: i32, z_max: i32) -> Self {
        let mut volume = Self::new(size);
        for z in z_min.max(0)..z_max.min(volume.size[2]) {
            volume.slices[z as usize] = Some(VoxelSlice::filled(volume.size[0], volume.size[1]));
        }
        volume
    }

    pub fn size(&self) -> [i32; 3] {
        self.size
    }

    fn in_range(&self, x: i32, y: i32, z: i32) -> bool {
        x >= 0 && y >= 0 && z >= 0 && x < self.size[0] && y < self.size[1] && z < self.size[2]
    }

    pub fn get_bit(&self, x: i32, y: i32, z: i32) -> bool {
        if !self.in_range(x, y, z) {
            return false;
        }
        self.slices[z as usize]
            .as_ref()
            .is_some_and(|slice| slice.get_bit(x, y))
    }

    /// Sets one bit, creating the slice on demand. Out-of-range writes are
    /// ignored and return false.
    pub fn set_bit(&mut self, x: i32, y: i32, z: i32, value: bool) -> bool {
        if !self.in_range(x, y, z) {
            log::debug!(
                "voxel write ({x}, {y}, {z}) outside volume {:?} ignored",
                self.size
            );
            return false;
        }
        let (w, h) = (self.size[0], self.size[1]);
        let slice = self.slices[z as usize].get_or_insert_with(|| VoxelSlice::new(w, h));
        slice.set_bit(x, y, value);
        self.centre = OnceLock::new();
        true
    }

    /// Replace a whole slice. A slice whose dimensions do not match the
    /// volume is rejected.
    pub fn set_slice(&mut self, z: i32, slice: VoxelSlice) -> bool {
        if z < 0 || z >= self.size[2] {
            log::warn!("slice {z} outside volume of depth {}", self.size[2]);
            return false;
        }
        if slice.width() != self.size[0] || slice.height() != self.size[1] {
            log::warn!(
                "slice {}×{} does not fit volume {:?}",
                slice.width(),
                slice.height(),
                self.size
            );
            return false;
        }
        self.slices[z as usize] = Some(slice);
        self.centre = OnceLock::new();
        true
    }

    pub fn slice_is_empty(&self, z: i32) -> bool {
        if z < 0 || z >= self.size[2] {
            return true;
        }
        self.slices[z as usize]
            .as_ref()
            .is_none_or(VoxelSlice::is_empty)
    }

    pub fn is_empty(&self) -> bool {
        (0..self.size[2]).all(|z| self.slice_is_empty(z))
    }

    /// Approximate centre used for targeting, in local voxel units.
    ///
    /// NOTE: this is not the centroid of the set bits. It averages the
    /// midpoints of the non-empty slices, so a volume whose bits sit in one
    /// corner of its slices still reports the slice midpoint in x/y. Shots
    /// aimed here can miss small, off-centre bodies; battle behaviour
    /// depends on that, so keep it.
    pub fn centre(&self) -> [f32; 3] {
        *self.centre.get_or_init(|| {
            let mid_x = self.size[0] as f32 / 2.0;
            let mid_y = self.size[1] as f32 / 2.0;
            let (sum, n) = (0..self.size[2])
                .filter(|&z| !self.slice_is_empty(z))
                .fold((0.0f32, 0u32), |(sum, n), z| (sum + z as f32 + 0.5, n + 1));
            let mid_z = if n == 0 {
                self.size[2] as f32 / 2.0
            } else {
                sum / n as f32
            };
            [mid_x, mid_y, mid_z]
        })
    }
}

// ---------------------------------------------------------------------------
// Multi-volume bodies
// ---------------------------------------------------------------------------

/// A grid of equally sized volumes forming one collidable body.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VoxelBody {
    /// Number of sub-volumes on each axis.
    grid: [i32; 3],
    /// Size of every sub-volume.
    volume_size: [i32; 3],
    /// Sub-volumes, index = z·gy·gx + y·gx + x. `None` is empty.
    volumes: Vec<Option<Arc<VoxelVolume>>>,
}

impl VoxelBody {
    pub fn single(volume: Arc<VoxelVolume>) -> Self {
        Self {
            grid: [1, 1, 1],
            volume_size: volume.size(),
            volumes: vec![Some(volume)],
        }
    }

    /// A `grid` of sub-volumes listed in index order. Volumes whose size
    /// differs from the first one are dropped with a warning.
    pub fn stacked(grid: [i32; 3], volumes: Vec<Option<Arc<VoxelVolume>>>) -> Self {
        let grid = grid.map(|g| g.max(0));
        let count = (grid[0] * grid[1] * grid[2]) as usize;
        let volume_size = volumes
            .iter()
            .flatten()
            .next()
            .map_or([0, 0, 0], |v| v.size());
        let mut volumes: Vec<_> = volumes
            .into_iter()
            .map(|v| match v {
                Some(v) if v.size() != volume_size => {
                    log::warn!(
                        "sub-volume {:?} does not match body volume size {volume_size:?}",
                        v.size()
                    );
                    None
                }
                other => other,
            })
            .collect();
        volumes.resize(count, None);
        Self {
            grid,
            volume_size,
            volumes,
        }
    }

    /// Total extent in voxels.
    pub fn size(&self) -> [i32; 3] {
        [
            self.grid[0] * self.volume_size[0],
            self.grid[1] * self.volume_size[1],
            self.grid[2] * self.volume_size[2],
        ]
    }

    fn sub_volume(&self, gx: i32, gy: i32, gz: i32) -> Option<&VoxelVolume> {
        let i = (gz * self.grid[1] * self.grid[0] + gy * self.grid[0] + gx) as usize;
        self.volumes.get(i)?.as_deref()
    }

    pub fn get_bit(&self, x: i32, y: i32, z: i32) -> bool {
        let [vx, vy, vz] = self.volume_size;
        if x < 0 || y < 0 || z < 0 || vx == 0 || vy == 0 || vz == 0 {
            return false;
        }
        let (gx, gy, gz) = (x / vx, y / vy, z / vz);
        if gx >= self.grid[0] || gy >= self.grid[1] || gz >= self.grid[2] {
            return false;
        }
        self.sub_volume(gx, gy, gz)
            .is_some_and(|v| v.get_bit(x % vx, y % vy, z % vz))
    }

    pub fn is_empty(&self) -> bool {
        self.volumes.iter().flatten().all(|v| v.is_empty())
    }

    /// Targeting centre in body-local voxel units: the mean of the non-empty
    /// sub-volumes' `centre()`s, each offset to its grid cell.
    pub fn centre(&self) -> [f32; 3] {
        let mut sum = [0.0f32; 3];
        let mut n = 0u32;
        for gz in 0..self.grid[2] {
            for gy in 0..self.grid[1] {
                for gx in 0..self.grid[0] {
                    let Some(v) = self.sub_volume(gx, gy, gz) else {
                        continue;
                    };
                    if v.is_empty() {
                        continue;
                    }
                    let c = v.centre();
                    let g = [gx, gy, gz];
                    for axis in 0..3 {
                        sum[axis] += c[axis] + (g[axis] * self.volume_size[axis]) as f32;
                    }
                    n += 1;
                }
            }
        }
        if n == 0 {
            return self.size().map(|s| s as f32 / 2.0);
        }
        sum.map(|s| s / n as f32)
    }
}
