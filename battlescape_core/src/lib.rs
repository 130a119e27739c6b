// battlescape_core: spatial core of a tactical battle simulation.
//
// This crate holds everything the battlescape needs to decide where things
// are and where they may go: the 3D tile map and its spatial index over
// placed objects, voxel collision bodies and ray casting, per-mover
// traversal rules, A* path search, and the per-unit mission state machine
// that turns orders into movement. It has no rendering, audio, or UI
// dependencies and can be tested and benchmarked headless.
//
// Module overview:
// - `battle.rs`:      Top-level Battle state, tick loop, command application, save/load.
// - `tilemap.rs`:     TileMap: tile grid, object insert/remove/move, cache maintenance.
// - `tile.rs`:        Tile: owned/intersecting sets, draw lists, cached traversal fields.
// - `object.rs`:      TileObject contract + the map's PlacedObject record.
// - `voxel.rs`:       VoxelSlice / VoxelVolume / VoxelBody collision shapes.
// - `collision.rs`:   Voxel-space line walk and TileMap::ray_collision.
// - `passability.rs`: TraversalPolicy trait + UnitTileHelper step rules.
// - `pathfinding.rs`: A* over tiles with bounded iterations and partial results.
// - `mission.rs`:     Mission kinds and their start/update/finish semantics.
// - `unit.rs`:        BattleUnit + the mission queue driver.
// - `item.rs`:        Loose and thrown items.
// - `projectile.rs`:  Shots in flight.
// - `effect.rs`:      Transient effects.
// - `map_part.rs`:    Scenery catalog (floors, walls, blocks, stairs, lifts).
// - `command.rs`:     BattleCommand / BattleAction, the external input.
// - `event.rs`:       BattleEvent, the narrative output.
// - `config.rs`:      BattleConfig + TileMapConfig + MovementRules + MissionRules.
// - `profile.rs`:     UnitProfile, data-driven mover capabilities.
// - `error.rs`:       BattleError.
// - `types.rs`:       Coordinates, ids, object kinds, facings, body states.
//
// **Critical constraint: determinism.** A battle is a pure function of its
// config and command stream. No `HashMap` iteration, no system time, no OS
// entropy. Use `BTreeMap` for ordered collections.

pub mod battle;
pub mod collision;
pub mod command;
pub mod config;
pub mod effect;
pub mod error;
pub mod event;
pub mod item;
pub mod map_part;
pub mod mission;
pub mod object;
pub mod passability;
pub mod pathfinding;
pub mod profile;
pub mod projectile;
pub mod tile;
pub mod tilemap;
pub mod types;
pub mod unit;
pub mod voxel;

#[cfg(test)]
mod testutil;
