// Core types shared across the battlescape core.
//
// Defines grid coordinates (`TileCoord`), continuous world positions
// (`WorldPos`, `Extent`), compact entity identifiers, the closed set of
// object kinds that can be placed on the tile map, and the small enums used
// by the traversal model and the mission machine (`Side`, `Facing`,
// `BodyState`, `BattleMode`). All types derive `Serialize`/`Deserialize` for
// save/load.
//
// Coordinate conventions:
// - X: east (positive) / west (negative)
// - Y: south (positive) / north (negative)
// - Z: up (positive) / down (negative)
//
// World positions are measured in tile units: the tile `(x, y, z)` spans
// `[x, x+1) × [y, y+1) × [z, z+1)`.
//
// See also: `tilemap.rs` for the grid these coordinates index,
// `object.rs` for how `ObjectKind` drives placement, `mission.rs` for
// `Facing`/`BodyState` transitions.
//
// **Critical constraint: determinism.** IDs are sequential integers
// allocated by `Battle`, never random. All ordering traits are total so the
// types can key `BTreeMap`s.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Mul, Sub};

// ---------------------------------------------------------------------------
// Spatial types
// ---------------------------------------------------------------------------

/// A cell position in the 3D tile grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileCoord {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl TileCoord {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    pub const fn offset(self, dx: i32, dy: i32, dz: i32) -> Self {
        Self::new(self.x + dx, self.y + dy, self.z + dz)
    }

    /// Chebyshev (king-move) distance. With 26-connectivity this is the
    /// minimum number of steps between two cells.
    pub fn chebyshev_distance(self, other: Self) -> u32 {
        (self.x - other.x)
            .unsigned_abs()
            .max((self.y - other.y).unsigned_abs())
            .max((self.z - other.z).unsigned_abs())
    }

    /// Straight-line distance between cell origins, in tiles.
    pub fn euclidean_distance(self, other: Self) -> f32 {
        let dx = (self.x - other.x) as f32;
        let dy = (self.y - other.y) as f32;
        let dz = (self.z - other.z) as f32;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    /// Number of axes on which the two coordinates differ (0–3).
    pub fn axes_changed(self, other: Self) -> u32 {
        u32::from(self.x != other.x) + u32::from(self.y != other.y) + u32::from(self.z != other.z)
    }

    /// True for the 26 neighbours of `self` (not `self` itself).
    pub fn is_adjacent(self, other: Self) -> bool {
        self.chebyshev_distance(other) == 1
    }

    /// Centre of the cell in world space.
    pub fn centre(self) -> WorldPos {
        WorldPos::new(
            self.x as f32 + 0.5,
            self.y as f32 + 0.5,
            self.z as f32 + 0.5,
        )
    }
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// A continuous position in world space, in tile units.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WorldPos {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl WorldPos {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// The tile containing this point.
    pub fn tile(self) -> TileCoord {
        TileCoord::new(
            self.x.floor() as i32,
            self.y.floor() as i32,
            self.z.floor() as i32,
        )
    }

    pub fn distance(self, other: Self) -> f32 {
        let d = other - self;
        (d.x * d.x + d.y * d.y + d.z * d.z).sqrt()
    }

    /// Linear interpolation; `t = 0` is `self`, `t = 1` is `other`.
    pub fn lerp(self, other: Self, t: f32) -> Self {
        self + (other - self) * t
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    pub fn to_array(self) -> [f32; 3] {
        [self.x, self.y, self.z]
    }
}

impl Add for WorldPos {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for WorldPos {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f32> for WorldPos {
    type Output = Self;
    fn mul(self, rhs: f32) -> Self {
        Self::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

impl fmt::Display for WorldPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.3}, {:.3}, {:.3})", self.x, self.y, self.z)
    }
}

/// Size of an axis-aligned bounding box, in tile units.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Extent {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Extent {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// One full tile.
    pub const TILE: Self = Self::new(1.0, 1.0, 1.0);
}

// ---------------------------------------------------------------------------
// Compact IDs: sequential integers allocated by `Battle`.
// ---------------------------------------------------------------------------

macro_rules! compact_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub u32);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }
    };
}

compact_id!(/// Handle of an object placed on the tile map.
ObjectId);
compact_id!(/// Identifier of a battle unit.
UnitId);
compact_id!(/// Identifier of an item lying on (or thrown across) the map.
ItemId);
compact_id!(/// Identifier of an in-flight projectile.
ProjectileId);
compact_id!(/// Identifier of a transient visual effect.
EffectId);
compact_id!(/// Identifier of a placed map part (ground, wall, feature).
MapPartId);
compact_id!(/// Identifier of a map part type in the part catalog.
MapPartTypeId);

/// Flat index of a tile in `TileMap`'s tile array.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileIndex(pub u32);

// ---------------------------------------------------------------------------
// Object kinds
// ---------------------------------------------------------------------------

/// The closed set of things that can occupy tiles.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ObjectKind {
    Ground,
    /// Wall on the tile's west (x-) face.
    LeftWall,
    /// Wall on the tile's north (y-) face.
    RightWall,
    Feature,
    Unit,
    Item,
    Projectile,
    Effect,
}

impl ObjectKind {
    pub const ALL: [ObjectKind; 8] = [
        ObjectKind::Ground,
        ObjectKind::LeftWall,
        ObjectKind::RightWall,
        ObjectKind::Feature,
        ObjectKind::Unit,
        ObjectKind::Item,
        ObjectKind::Projectile,
        ObjectKind::Effect,
    ];

    /// Kinds whose presence changes a tile's cached traversal fields.
    pub fn is_structural(self) -> bool {
        matches!(
            self,
            ObjectKind::Ground | ObjectKind::LeftWall | ObjectKind::RightWall | ObjectKind::Feature
        )
    }

    /// Ground-anchored kinds are positioned by their feet; everything else
    /// by its geometric centre.
    pub fn anchor(self) -> Anchor {
        match self {
            ObjectKind::Unit | ObjectKind::Item => Anchor::Foot,
            _ => Anchor::Centre,
        }
    }

    /// Draw-order tie-break at equal depth: ground, then walls, then the rest.
    pub fn draw_rank(self) -> u8 {
        match self {
            ObjectKind::Ground => 0,
            ObjectKind::LeftWall | ObjectKind::RightWall => 1,
            _ => 2,
        }
    }

    fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

/// Where an object's position sits within its bounding box.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Anchor {
    /// Position is the box centre.
    Centre,
    /// Position is the centre of the box's bottom face.
    Foot,
}

/// A set of `ObjectKind`s, used to filter collision queries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectKindSet(u8);

impl ObjectKindSet {
    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn all() -> Self {
        Self(u8::MAX)
    }

    pub fn of(kinds: &[ObjectKind]) -> Self {
        kinds.iter().fold(Self::empty(), |set, &k| set.with(k))
    }

    pub fn with(self, kind: ObjectKind) -> Self {
        Self(self.0 | kind.bit())
    }

    pub fn without(self, kind: ObjectKind) -> Self {
        Self(self.0 & !kind.bit())
    }

    pub fn contains(self, kind: ObjectKind) -> bool {
        self.0 & kind.bit() != 0
    }
}

impl Default for ObjectKindSet {
    fn default() -> Self {
        Self::all()
    }
}

// ---------------------------------------------------------------------------
// Traversal and mission enums
// ---------------------------------------------------------------------------

/// One of a tile's four vertical faces.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    /// x- face (carries the tile's own left wall).
    West,
    /// y- face (carries the tile's own right wall).
    North,
    /// x+ face (the east neighbour's left wall).
    East,
    /// y+ face (the south neighbour's right wall).
    South,
}

impl Side {
    pub const ALL: [Side; 4] = [Side::West, Side::North, Side::East, Side::South];

    pub fn index(self) -> usize {
        self as usize
    }

    /// The face of `to` crossed when stepping into it from the orthogonally
    /// adjacent column of `from`. Z is ignored; `None` unless the columns
    /// differ by exactly one step on exactly one axis.
    pub fn entered(from: TileCoord, to: TileCoord) -> Option<Side> {
        match (from.x - to.x, from.y - to.y) {
            (1, 0) => Some(Side::East),
            (-1, 0) => Some(Side::West),
            (0, 1) => Some(Side::South),
            (0, -1) => Some(Side::North),
            _ => None,
        }
    }
}

/// Eight-way facing, clockwise from north.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Facing {
    North,
    NorthEast,
    East,
    SouthEast,
    South,
    SouthWest,
    West,
    NorthWest,
}

impl Facing {
    pub const ALL: [Facing; 8] = [
        Facing::North,
        Facing::NorthEast,
        Facing::East,
        Facing::SouthEast,
        Facing::South,
        Facing::SouthWest,
        Facing::West,
        Facing::NorthWest,
    ];

    pub fn delta(self) -> (i32, i32) {
        match self {
            Facing::North => (0, -1),
            Facing::NorthEast => (1, -1),
            Facing::East => (1, 0),
            Facing::SouthEast => (1, 1),
            Facing::South => (0, 1),
            Facing::SouthWest => (-1, 1),
            Facing::West => (-1, 0),
            Facing::NorthWest => (-1, -1),
        }
    }

    /// Facing for a planar direction. Only the signs matter; `(0, 0)` has
    /// no facing.
    pub fn from_delta(dx: i32, dy: i32) -> Option<Facing> {
        let key = (dx.signum(), dy.signum());
        Self::ALL.into_iter().find(|f| f.delta() == key)
    }

    /// One 45° step toward `target` along the shorter rotation (clockwise on
    /// a tie).
    pub fn step_toward(self, target: Facing) -> Facing {
        let diff = (target as usize + 8 - self as usize) % 8;
        match diff {
            0 => self,
            1..=4 => Self::ALL[(self as usize + 1) % 8],
            _ => Self::ALL[(self as usize + 7) % 8],
        }
    }
}

/// A unit's body posture.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BodyState {
    Standing,
    Kneeling,
    Prone,
    Flying,
    /// Dead or unconscious; cannot change state or move.
    Downed,
}

impl BodyState {
    /// Whether a unit can go from `self` to `target` without passing through
    /// another state. Standing is the hub of the posture graph.
    pub fn transitions_directly_to(self, target: BodyState) -> bool {
        self != BodyState::Downed
            && target != BodyState::Downed
            && (self == target || self == BodyState::Standing || target == BodyState::Standing)
    }
}

/// Real-time battles ignore time units; turn-based battles spend them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BattleMode {
    RealTime,
    TurnBased,
}

/// Data-driven mover archetypes; see `profile.rs`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Archetype {
    Agent,
    Brainsucker,
    Skeletoid,
    Megaspawn,
}
