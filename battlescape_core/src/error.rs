// Error type for fallible battlescape operations.
//
// Construction, configuration loading, entity lookups, and save/load return
// `Result<_, BattleError>`. Per-tick mutators (insert, remove, move, mission
// updates) do not: they log through the `log` facade and degrade, so a bad
// input never stops the tick loop.
//
// See also: `config.rs` (`TileMapConfig::validate`), `tilemap.rs`
// (`TileMap::try_tile`), `battle.rs` (spawn and save/load).

use crate::types::{Archetype, MapPartTypeId, ObjectId, ObjectKind, TileCoord, UnitId};

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum BattleError {
    #[error("tile {coord} is outside the map")]
    OutOfBounds { coord: TileCoord },

    #[error("map dimensions must be positive, got {x}×{y}×{z}")]
    InvalidDimensions { x: i32, y: i32, z: i32 },

    #[error("voxel size must be positive on every axis, got {0:?}")]
    InvalidVoxelSize([i32; 3]),

    #[error("map of {x}×{y}×{z} tiles at voxel size {voxel_size:?} is too large to index")]
    MapTooLarge {
        x: i32,
        y: i32,
        z: i32,
        voxel_size: [i32; 3],
    },

    #[error("movement rule {rule} has unusable value {value}")]
    InvalidMovementRule { rule: &'static str, value: f32 },

    #[error("no draw layer configured for {0:?}")]
    MissingLayer(ObjectKind),

    #[error("layer {layer} for {kind:?} exceeds layer count {count}")]
    LayerOutOfRange {
        kind: ObjectKind,
        layer: usize,
        count: usize,
    },

    #[error("no unit profile for archetype {0:?}")]
    MissingProfile(Archetype),

    #[error("unknown map part type {0:?}")]
    UnknownPartType(MapPartTypeId),

    #[error("unknown unit {0}")]
    UnknownUnit(UnitId),

    #[error("could not place object {0} on the map")]
    PlacementFailed(ObjectId),

    #[error("serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

pub type BattleResult<T> = Result<T, BattleError>;
