// Batch conversion over a tile range.
//
// For every tile in the configured range: read the legacy file (if there is
// one), derive diagonal flags, and write the unified region file. A bad
// input file costs only its own tile; the batch logs it and keeps going. The
// returned `ConvertSummary` says how many tiles went each way.
//
// See also: `legacy.rs` for the readers, `diagonal.rs` for flag derivation,
// `main.rs` for the CLI that fills in `ConvertOptions`.

use std::fmt;
use std::path::{Path, PathBuf};

use geodata_core::config::{WorldLayout, region_file_name};
use geodata_core::region::BlockCounts;

use crate::diagonal::derive_diagonals;
use crate::error::ConvertError;
use crate::legacy::{LegacyFormat, load_region};

#[derive(Clone, Debug)]
pub struct ConvertOptions {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub format: LegacyFormat,
    /// Tile range to convert; world origin fields are unused.
    pub tiles: WorldLayout,
    /// Input name pattern; `None` uses the format's conventional pattern.
    pub input_pattern: Option<String>,
    pub output_pattern: String,
    /// Treat a header/file name tile mismatch as an error.
    pub strict_header: bool,
    /// Derive diagonal NSWE flags before writing.
    pub derive_diagonals: bool,
}

impl ConvertOptions {
    pub fn new(input_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>, format: LegacyFormat) -> Self {
        Self {
            input_dir: input_dir.into(),
            output_dir: output_dir.into(),
            format,
            tiles: WorldLayout::default(),
            input_pattern: None,
            output_pattern: "{x}_{y}.geo".into(),
            strict_header: false,
            derive_diagonals: true,
        }
    }

    pub fn input_path(&self, tile_x: i32, tile_y: i32) -> PathBuf {
        let pattern = self
            .input_pattern
            .as_deref()
            .unwrap_or(self.format.default_pattern());
        self.input_dir.join(region_file_name(pattern, tile_x, tile_y))
    }

    pub fn output_path(&self, tile_x: i32, tile_y: i32) -> PathBuf {
        self.output_dir
            .join(region_file_name(&self.output_pattern, tile_x, tile_y))
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ConvertSummary {
    pub converted: usize,
    pub missing: usize,
    pub failed: usize,
    /// Block variants across all converted regions.
    pub blocks: BlockCounts,
    /// Layers that received derived diagonal flags.
    pub diagonal_updates: usize,
}

impl fmt::Display for ConvertSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} converted, {} missing, {} failed ({} flat / {} complex / {} multilayer blocks)",
            self.converted,
            self.missing,
            self.failed,
            self.blocks.flat,
            self.blocks.complex,
            self.blocks.multilayer
        )
    }
}

/// Convert one legacy file to one unified file. Returns the block counts of
/// the region written and the number of layers given diagonal flags.
pub fn convert_file(
    input: &Path,
    output: &Path,
    options: &ConvertOptions,
    tile: (i32, i32),
) -> Result<(BlockCounts, usize), ConvertError> {
    let mut region = load_region(input, options.format, tile, options.strict_header)?;
    let updates = if options.derive_diagonals {
        derive_diagonals(&mut region)
    } else {
        0
    };
    region.save(output)?;
    Ok((region.counts(), updates))
}

/// Convert every tile in `options.tiles`. Fails only if the output directory
/// cannot be created; per-tile problems are counted in the summary.
pub fn convert_all(options: &ConvertOptions) -> Result<ConvertSummary, ConvertError> {
    std::fs::create_dir_all(&options.output_dir)?;
    let mut summary = ConvertSummary::default();
    for (tile_x, tile_y) in options.tiles.tiles() {
        let input = options.input_path(tile_x, tile_y);
        if !input.is_file() {
            tracing::info!(path = %input.display(), "no legacy file, skipping tile");
            summary.missing += 1;
            continue;
        }
        let output = options.output_path(tile_x, tile_y);
        match convert_file(&input, &output, options, (tile_x, tile_y)) {
            Ok((blocks, updates)) => {
                tracing::info!(
                    input = %input.display(),
                    output = %output.display(),
                    flat = blocks.flat,
                    complex = blocks.complex,
                    multilayer = blocks.multilayer,
                    "region converted"
                );
                summary.converted += 1;
                summary.blocks += blocks;
                summary.diagonal_updates += updates;
            }
            Err(err) => {
                tracing::warn!(input = %input.display(), error = %err, "region conversion failed, skipping");
                summary.failed += 1;
            }
        }
    }
    tracing::info!(%summary, "conversion finished");
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::legacy::{COMPACT_TAG_COMPLEX, COMPACT_TAG_FLAT, encode_word};
    use geodata_core::block::Layer;
    use geodata_core::consts::{BLOCK_CELLS, REGION_BLOCKS};
    use geodata_core::nswe::Nswe;
    use geodata_core::region::Region;

    /// Compact legacy region: all flat at `height`, except block 0 which is
    /// complex with every cell fully open.
    fn compact_fixture(height: i16) -> Vec<u8> {
        let mut buf = vec![COMPACT_TAG_COMPLEX];
        for _ in 0..BLOCK_CELLS {
            buf.extend_from_slice(&encode_word(Layer::new(height, Nswe::CARDINAL)).to_le_bytes());
        }
        for _ in 1..REGION_BLOCKS {
            buf.push(COMPACT_TAG_FLAT);
            buf.extend_from_slice(&height.to_le_bytes());
        }
        buf
    }

    fn options(input: &Path, output: &Path) -> ConvertOptions {
        ConvertOptions {
            tiles: WorldLayout::origin_grid(2, 2),
            ..ConvertOptions::new(input, output, LegacyFormat::Compact)
        }
    }

    #[test]
    fn default_patterns() {
        let opts = ConvertOptions::new("in", "out", LegacyFormat::HeaderPrefixed);
        assert_eq!(opts.input_path(22, 19), Path::new("in/22_19_conv.dat"));
        assert_eq!(opts.output_path(22, 19), Path::new("out/22_19.geo"));
    }

    #[test]
    fn converts_present_skips_missing_and_corrupt() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let opts = options(input.path(), &output.path().join("geo"));
        std::fs::write(opts.input_path(0, 0), compact_fixture(32)).unwrap();
        std::fs::write(opts.input_path(1, 1), compact_fixture(-64)).unwrap();
        // Corrupt: unknown tag right away.
        std::fs::write(opts.input_path(0, 1), [7u8, 0, 0]).unwrap();

        let summary = convert_all(&opts).unwrap();
        assert_eq!(summary.converted, 2);
        assert_eq!(summary.missing, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.blocks.complex, 2);
        assert_eq!(summary.blocks.flat, 2 * (REGION_BLOCKS - 1));

        let region = Region::load(&opts.output_path(0, 0)).unwrap();
        let block = region.block(0, 0);
        assert_eq!(block.height_nearest(3, 3, 0), 32);
        // Diagonals were derived for the complex block.
        assert_eq!(block.nswe_nearest(3, 3, 0), Nswe::ALL);
        assert!(!opts.output_path(0, 1).exists());
    }

    #[test]
    fn diagonals_can_be_skipped() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let opts = ConvertOptions {
            derive_diagonals: false,
            tiles: WorldLayout::origin_grid(1, 1),
            ..options(input.path(), output.path())
        };
        std::fs::write(opts.input_path(0, 0), compact_fixture(0)).unwrap();
        let summary = convert_all(&opts).unwrap();
        assert_eq!(summary.diagonal_updates, 0);
        let region = Region::load(&opts.output_path(0, 0)).unwrap();
        assert_eq!(region.block(0, 0).nswe_nearest(3, 3, 0), Nswe::CARDINAL);
    }

    #[test]
    fn summary_display() {
        let summary = ConvertSummary {
            converted: 3,
            missing: 1,
            failed: 0,
            blocks: BlockCounts {
                null: 0,
                flat: 10,
                complex: 2,
                multilayer: 1,
            },
            diagonal_updates: 0,
        };
        assert_eq!(
            summary.to_string(),
            "3 converted, 1 missing, 0 failed (10 flat / 2 complex / 1 multilayer blocks)"
        );
    }
}
