// geodata_core: world walkability/height engine and pathfinding.
//
// This crate owns the runtime side of geodata: the block storage that the
// offline converter writes, the facade that turns world coordinates into
// block lookups, the movement and line-of-sight checker, and the pooled A*
// pathfinder. It has no knowledge of the game server around it; movement and
// AI code call into `GeoEngine` (or the individual components) directly.
//
// Module overview:
// - `consts.rs`:       Fixed grid ratios (cell/block/region) and format tags.
// - `nswe.rs`:         8-bit passability flag set (4 cardinal + 4 diagonal).
// - `types.rs`:        `Location` (world space) and `GeoPos` (grid space).
// - `error.rs`:        `GeoError`: load failures and out-of-range height queries.
// - `block.rs`:        `Block` enum (Null/Flat/Complex/Multilayer) + unified codec.
// - `region.rs`:       256x256 block grid, one per on-disk region file.
// - `config.rs`:       `GeoConfig`, `WorldLayout`, buffer tier specs.
// - `geo.rs`:          `GeoData` facade: region/block dispatch, fail-open lookups.
// - `obstacle.rs`:     Door/static-obstacle collaborator consulted before checks.
// - `check.rs`:        `Checker`: straight-line movement and line of sight.
// - `node_buffer.rs`:  Scratch arena + A* search for one in-flight path query.
// - `pool.rs`:         Tiered, non-blocking `NodeBuffer` pool with statistics.
// - `pathfinding.rs`:  `PathFinder`: search, path construction, smoothing.
// - `engine.rs`:       `GeoEngine`: the bundle the server holds on to.
//
// The companion crate `geodata_convert` produces the region files this crate
// loads; both share the `Block` type so variant logic lives in one place.
//
// **Critical constraint: immutability after load.** `GeoData` is built once
// and then only read, from any number of threads, without locks. The buffer
// pool is the only shared mutable state and it never blocks.

pub mod block;
pub mod check;
pub mod config;
pub mod consts;
pub mod engine;
pub mod error;
pub mod geo;
pub mod node_buffer;
pub mod nswe;
pub mod obstacle;
pub mod pathfinding;
pub mod pool;
pub mod region;
pub mod types;

pub use engine::GeoEngine;
pub use error::GeoError;
