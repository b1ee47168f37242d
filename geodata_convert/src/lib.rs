// geodata_convert: offline converter from legacy geodata to unified regions.
//
// Reads region files in either of the two legacy layouts, fills in diagonal
// NSWE flags the legacy data never stored, and writes the unified format
// that `geodata_core::region::Region::load` reads at runtime. Runs once per
// data drop, never inside the server.
//
// Module overview:
// - `error.rs`:    `ConvertError`: per-region failures.
// - `legacy.rs`:   `LegacyFormat`, packed-word codec, block/region readers.
// - `diagonal.rs`: Derivation of diagonal flags from cardinal neighbours.
// - `batch.rs`:    `convert_all` over a tile range, with a summary.
//
// The `geoconv` binary (`main.rs`) is a thin clap front end over `batch`.
//
// **Critical constraint:** output goes through the core crate's `Block`
// writer, so converter and runtime can never disagree on the unified layout.

pub mod batch;
pub mod diagonal;
pub mod error;
pub mod legacy;

pub use batch::{ConvertOptions, ConvertSummary, convert_all};
pub use error::ConvertError;
pub use legacy::LegacyFormat;
