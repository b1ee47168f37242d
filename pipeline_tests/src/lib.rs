// Test harness for the convert → load → query pipeline.
//
// `TestWorld` owns a temporary directory with a `legacy/` input folder and a
// `geodata/` output folder. Tests describe terrain as core `Region`s, write
// them out in a legacy layout with `write_legacy`, run the real converter,
// and load the result through a real `GeoConfig` file into a `GeoEngine`.
// The only test-specific code is the legacy writer below, which mirrors the
// converter's readers.
//
// See also: `tests/full_pipeline.rs` for the scenarios.

use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, WriteBytesExt};
use geodata_convert::legacy::{
    COMPACT_TAG_COMPLEX, COMPACT_TAG_FLAT, COMPACT_TAG_MULTILAYER, HEADER_LEN, HEADER_TAG_COMPLEX, HEADER_TAG_FLAT,
    encode_word,
};
use geodata_convert::{ConvertOptions, ConvertSummary, LegacyFormat, convert_all};
use geodata_core::GeoEngine;
use geodata_core::block::{Block, CellLayers, Layer};
use geodata_core::config::{GeoConfig, WorldLayout};
use geodata_core::consts::{BLOCK_CELLS, CELL_SIZE};
use geodata_core::nswe::Nswe;
use geodata_core::region::Region;
use geodata_core::types::Location;
use smallvec::smallvec;
use tempfile::TempDir;

/// Tag used for multilayer blocks in header-prefixed fixtures. Any value other
/// than the flat and complex tags means multilayer.
const HEADER_TAG_MULTILAYER: i16 = 0x0048;

/// Tiles 20..=22 x 18, with tile (20, 18) starting at world (0, 0).
pub const LAYOUT: WorldLayout = WorldLayout {
    tile_x_min: 20,
    tile_x_max: 22,
    tile_y_min: 18,
    tile_y_max: 18,
    world_x_min: 0,
    world_y_min: 0,
};

/// Column of the wall in `walled_region`.
pub const WALL_X: i32 = 100;
/// Row of the one-cell gap in the wall.
pub const GAP_Y: i32 = 150;
pub const WALL_HEIGHT: i16 = 200;

/// Cells covered by the two-floor block in `walled_region`.
pub const BRIDGE_CELLS: std::ops::Range<i32> = 320..328;
pub const BRIDGE_HEIGHT: i16 = 200;

// ---------------------------------------------------------------------------
// Terrain
// ---------------------------------------------------------------------------

/// Flat ground at height 0 with a tall wall along column `WALL_X`. The wall
/// has a gap at `GAP_Y` when `gap` is set. Block (40, 40) is a two-floor
/// multilayer block: ground at 0 and a deck at `BRIDGE_HEIGHT`.
pub fn walled_region(gap: bool) -> Region {
    let mut region = Region::flat(0);
    let no_east = Nswe::N | Nswe::S | Nswe::W;
    let no_west = Nswe::N | Nswe::S | Nswe::E;
    for y in 0..2048 {
        if gap && y == GAP_Y {
            region.set_complex_cell(WALL_X, y, Layer::new(0, Nswe::W | Nswe::E));
            continue;
        }
        region.set_complex_cell(WALL_X - 1, y, Layer::new(0, no_east));
        region.set_complex_cell(WALL_X, y, Layer::new(WALL_HEIGHT, Nswe::NONE));
        region.set_complex_cell(WALL_X + 1, y, Layer::new(0, no_west));
    }
    let two_floors: CellLayers = smallvec![
        Layer::new(0, Nswe::CARDINAL),
        Layer::new(BRIDGE_HEIGHT, Nswe::CARDINAL)
    ];
    region.set_block(
        BRIDGE_CELLS.start / 8,
        BRIDGE_CELLS.start / 8,
        Block::multilayer(vec![two_floors; BLOCK_CELLS]),
    );
    region
}

/// World location at the centre of a cell of the first tile.
pub fn loc(geo_x: i32, geo_y: i32, z: i32) -> Location {
    Location::new(
        LAYOUT.world_x_min + geo_x * CELL_SIZE + CELL_SIZE / 2,
        LAYOUT.world_y_min + geo_y * CELL_SIZE + CELL_SIZE / 2,
        z,
    )
}

// ---------------------------------------------------------------------------
// Legacy writers
// ---------------------------------------------------------------------------

fn write_words(out: &mut Vec<u8>, layers: &[Layer]) {
    for layer in layers {
        out.write_i16::<LittleEndian>(encode_word(*layer)).expect("write to Vec");
    }
}

/// Serialize a region in a legacy layout. Heights should be multiples of 8
/// and flags cardinal for a lossless trip. Panics on `Null` blocks, which
/// neither legacy layout can express.
pub fn legacy_bytes(region: &Region, format: LegacyFormat, tile: (i32, i32)) -> Vec<u8> {
    let mut out = Vec::new();
    if format == LegacyFormat::HeaderPrefixed {
        let mut header = [0u8; HEADER_LEN];
        header[0] = u8::try_from(tile.0).expect("tile x fits in a byte");
        header[1] = u8::try_from(tile.1).expect("tile y fits in a byte");
        out.extend_from_slice(&header);
    }
    for block in region.blocks() {
        match (format, block) {
            (_, Block::Null) => panic!("legacy layouts have no null block"),
            (LegacyFormat::Compact, Block::Flat { height }) => {
                out.push(COMPACT_TAG_FLAT);
                out.write_i16::<LittleEndian>(*height).expect("write to Vec");
            }
            (LegacyFormat::HeaderPrefixed, Block::Flat { height }) => {
                out.write_i16::<LittleEndian>(HEADER_TAG_FLAT).expect("write to Vec");
                out.write_i16::<LittleEndian>(*height).expect("write to Vec");
                out.write_i16::<LittleEndian>(*height).expect("write to Vec");
            }
            (LegacyFormat::Compact, Block::Complex(cells)) => {
                out.push(COMPACT_TAG_COMPLEX);
                write_words(&mut out, cells.as_slice());
            }
            (LegacyFormat::HeaderPrefixed, Block::Complex(cells)) => {
                out.write_i16::<LittleEndian>(HEADER_TAG_COMPLEX).expect("write to Vec");
                write_words(&mut out, cells.as_slice());
            }
            (LegacyFormat::Compact, Block::Multilayer(cells)) => {
                out.push(COMPACT_TAG_MULTILAYER);
                for layers in cells.iter() {
                    out.push(u8::try_from(layers.len()).expect("layer count fits in a byte"));
                    write_words(&mut out, layers);
                }
            }
            (LegacyFormat::HeaderPrefixed, Block::Multilayer(cells)) => {
                out.write_i16::<LittleEndian>(HEADER_TAG_MULTILAYER).expect("write to Vec");
                for layers in cells.iter() {
                    let count = i16::try_from(layers.len()).expect("layer count fits in an i16");
                    out.write_i16::<LittleEndian>(count).expect("write to Vec");
                    write_words(&mut out, layers);
                }
            }
        }
    }
    out
}

// ---------------------------------------------------------------------------
// TestWorld
// ---------------------------------------------------------------------------

pub struct TestWorld {
    dir: TempDir,
}

impl Default for TestWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl TestWorld {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        std::fs::create_dir(dir.path().join("legacy")).expect("create legacy dir");
        Self { dir }
    }

    pub fn legacy_dir(&self) -> PathBuf {
        self.dir.path().join("legacy")
    }

    pub fn geodata_dir(&self) -> PathBuf {
        self.dir.path().join("geodata")
    }

    /// Converter options for this world's directories and `LAYOUT`.
    pub fn convert_options(&self, format: LegacyFormat) -> ConvertOptions {
        ConvertOptions {
            tiles: LAYOUT,
            ..ConvertOptions::new(self.legacy_dir(), self.geodata_dir(), format)
        }
    }

    /// Write `region` as the legacy file for `tile`, named the way the
    /// converter expects for `format`.
    pub fn write_legacy(&self, tile: (i32, i32), region: &Region, format: LegacyFormat) -> PathBuf {
        let path = self.convert_options(format).input_path(tile.0, tile.1);
        std::fs::write(&path, legacy_bytes(region, format, tile)).expect("write legacy file");
        path
    }

    /// Write raw bytes as the legacy file for `tile`.
    pub fn write_legacy_raw(&self, tile: (i32, i32), format: LegacyFormat, bytes: &[u8]) {
        let path = self.convert_options(format).input_path(tile.0, tile.1);
        std::fs::write(path, bytes).expect("write legacy file");
    }

    pub fn convert(&self, format: LegacyFormat) -> ConvertSummary {
        convert_all(&self.convert_options(format)).expect("convert_all")
    }

    /// Path of the unified region file for `tile`.
    pub fn unified_path(&self, tile: (i32, i32)) -> PathBuf {
        self.convert_options(LegacyFormat::Compact).output_path(tile.0, tile.1)
    }

    /// Engine config pointing at this world's converted output.
    pub fn config(&self) -> GeoConfig {
        GeoConfig {
            geodata_path: self.geodata_dir(),
            layout: LAYOUT,
            ..GeoConfig::default()
        }
    }

    /// Write `config` as JSON and load an engine through it, the way a
    /// server would at startup.
    pub fn engine_with(&self, config: &GeoConfig) -> GeoEngine {
        let path = self.dir.path().join("geodata.json");
        write_json(&path, config);
        let config = GeoConfig::load(&path).expect("load config");
        GeoEngine::load(config).expect("load engine")
    }

    pub fn engine(&self) -> GeoEngine {
        self.engine_with(&self.config())
    }
}

fn write_json(path: &Path, config: &GeoConfig) {
    let json = serde_json::to_string_pretty(config).expect("serialize config");
    std::fs::write(path, json).expect("write config");
}
