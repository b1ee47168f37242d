// One region: a 256x256 grid of blocks, loaded from and saved to one file.
//
// On disk a region is simply its blocks in row-major `(block_x, block_y)`
// order (`block_x` is the outer loop), each encoded by `Block::write`.
// There is no header; the region's position in the world comes from the
// file name (see `config::region_file_name`).
//
// Loading is all-or-nothing: an unknown block tag or a truncated payload
// fails the whole file. Trailing bytes after the last block are ignored
// with a warning.
//
// See also: `block.rs` for the per-block codec, `geo.rs` for the facade that
// owns regions, and `geodata_convert` for the tool that writes them.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::block::{Block, Layer, cell_index};
use crate::consts::{BLOCK_CELLS_X, BLOCK_CELLS_Y, REGION_BLOCKS, REGION_BLOCKS_Y};
use crate::error::GeoError;
use crate::nswe::Nswe;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Region {
    /// Always `REGION_BLOCKS` entries, indexed by `block_index`.
    blocks: Box<[Block]>,
}

/// Index of a block in region order.
pub fn block_index(block_x: i32, block_y: i32) -> usize {
    (block_x * REGION_BLOCKS_Y + block_y) as usize
}

/// Counts of each block variant, for load summaries.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BlockCounts {
    pub null: usize,
    pub flat: usize,
    pub complex: usize,
    pub multilayer: usize,
}

impl std::ops::AddAssign for BlockCounts {
    fn add_assign(&mut self, rhs: Self) {
        self.null += rhs.null;
        self.flat += rhs.flat;
        self.complex += rhs.complex;
        self.multilayer += rhs.multilayer;
    }
}

impl Region {
    /// A region where every block is `Null`.
    pub fn null() -> Self {
        Self::filled(Block::Null)
    }

    /// A region where every block is `Flat` at `height`.
    pub fn flat(height: i16) -> Self {
        Self::filled(Block::Flat { height })
    }

    pub fn filled(block: Block) -> Self {
        Self {
            blocks: vec![block; REGION_BLOCKS].into_boxed_slice(),
        }
    }

    /// Build from blocks in region order. Panics on a wrong block count.
    pub fn from_blocks(blocks: Vec<Block>) -> Self {
        assert_eq!(blocks.len(), REGION_BLOCKS, "region needs 65536 blocks");
        Self {
            blocks: blocks.into_boxed_slice(),
        }
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn block(&self, block_x: i32, block_y: i32) -> &Block {
        &self.blocks[block_index(block_x, block_y)]
    }

    pub fn block_mut(&mut self, block_x: i32, block_y: i32) -> &mut Block {
        &mut self.blocks[block_index(block_x, block_y)]
    }

    pub fn set_block(&mut self, block_x: i32, block_y: i32, block: Block) {
        self.blocks[block_index(block_x, block_y)] = block;
    }

    /// Block holding a region-local cell.
    pub fn block_at_cell(&self, cell_x: i32, cell_y: i32) -> &Block {
        self.block(cell_x / BLOCK_CELLS_X, cell_y / BLOCK_CELLS_Y)
    }

    /// Overwrite a single region-local cell of a `Complex` block, converting
    /// a `Flat` or `Null` block to `Complex` first (keeping its height).
    /// Intended for building test terrain and tools; panics on multilayer.
    pub fn set_complex_cell(&mut self, cell_x: i32, cell_y: i32, layer: Layer) {
        let block = self.block_mut(cell_x / BLOCK_CELLS_X, cell_y / BLOCK_CELLS_Y);
        let promoted = match block {
            Block::Null => Some(Block::complex_filled(0, Nswe::ALL)),
            Block::Flat { height } => Some(Block::complex_filled(*height, Nswe::ALL)),
            Block::Complex(_) => None,
            Block::Multilayer(_) => panic!("set_complex_cell on a multilayer block"),
        };
        if let Some(promoted) = promoted {
            *block = promoted;
        }
        block.cell_layers_mut(cell_index(cell_x, cell_y))[0] = layer;
    }

    pub fn counts(&self) -> BlockCounts {
        let mut counts = BlockCounts::default();
        for block in self.blocks.iter() {
            match block {
                Block::Null => counts.null += 1,
                Block::Flat { .. } => counts.flat += 1,
                Block::Complex(_) => counts.complex += 1,
                Block::Multilayer(_) => counts.multilayer += 1,
            }
        }
        counts
    }

    // -----------------------------------------------------------------------
    // I/O
    // -----------------------------------------------------------------------

    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self, GeoError> {
        let mut blocks = Vec::with_capacity(REGION_BLOCKS);
        for index in 0..REGION_BLOCKS {
            blocks.push(Block::read(reader, index)?);
        }
        Ok(Self::from_blocks(blocks))
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<(), GeoError> {
        for block in self.blocks.iter() {
            block.write(writer)?;
        }
        Ok(())
    }

    /// Load a region file. Errors carry the file path.
    pub fn load(path: &Path) -> Result<Self, GeoError> {
        let file = File::open(path).map_err(|e| GeoError::Io(e).at_path(path))?;
        let mut reader = BufReader::new(file);
        let region = Self::read_from(&mut reader).map_err(|e| e.at_path(path))?;
        let mut trailing = [0u8; 1];
        if reader.read(&mut trailing).map_err(|e| GeoError::Io(e).at_path(path))? > 0 {
            tracing::warn!(path = %path.display(), "trailing data after last block ignored");
        }
        Ok(region)
    }

    pub fn save(&self, path: &Path) -> Result<(), GeoError> {
        let file = File::create(path).map_err(|e| GeoError::Io(e).at_path(path))?;
        let mut writer = BufWriter::new(file);
        self.write_to(&mut writer).map_err(|e| e.at_path(path))?;
        writer.flush().map_err(|e| GeoError::Io(e).at_path(path))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::{TAG_COMPLEX, TAG_FLAT};
    use std::io::Cursor;

    #[test]
    fn block_index_is_row_major_by_x() {
        assert_eq!(block_index(0, 0), 0);
        assert_eq!(block_index(0, 1), 1);
        assert_eq!(block_index(1, 0), 256);
        assert_eq!(block_index(255, 255), REGION_BLOCKS - 1);
    }

    #[test]
    fn set_complex_cell_promotes_flat() {
        let mut region = Region::flat(50);
        region.set_complex_cell(9, 10, Layer::new(80, Nswe::N));
        let block = region.block(1, 1);
        assert_eq!(block.kind(), "complex");
        assert_eq!(block.height_nearest(9, 10, 0), 80);
        assert_eq!(block.height_nearest(8, 8, 0), 50);
        assert_eq!(region.block(0, 0).kind(), "flat");
    }

    #[test]
    fn roundtrip_region_bytes() {
        let mut region = Region::flat(-100);
        region.set_complex_cell(2047, 0, Layer::new(7, Nswe::SE | Nswe::W));
        let mut buf = Vec::new();
        region.write_to(&mut buf).unwrap();
        let restored = Region::read_from(&mut Cursor::new(&buf)).unwrap();
        assert_eq!(restored, region);

        let mut again = Vec::new();
        restored.write_to(&mut again).unwrap();
        assert_eq!(buf, again);
    }

    #[test]
    fn unknown_tag_names_block() {
        let mut buf = Vec::new();
        for _ in 0..5 {
            buf.extend_from_slice(&[TAG_FLAT, 0, 0]);
        }
        buf.push(0x33);
        let err = Region::read_from(&mut Cursor::new(&buf)).unwrap_err();
        assert!(matches!(
            err,
            GeoError::UnknownBlockType { tag: 0x33, block: 5 }
        ));
    }

    #[test]
    fn truncated_file_fails() {
        let buf = vec![TAG_COMPLEX, 0, 0];
        assert!(Region::read_from(&mut Cursor::new(&buf)).is_err());
    }

    #[test]
    fn save_and_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("20_18.geo");
        let mut region = Region::flat(12);
        region.set_complex_cell(100, 200, Layer::new(-8, Nswe::CARDINAL));
        region.save(&path).unwrap();
        let loaded = Region::load(&path).unwrap();
        assert_eq!(loaded, region);
        assert_eq!(
            loaded.counts(),
            BlockCounts {
                null: 0,
                flat: REGION_BLOCKS - 1,
                complex: 1,
                multilayer: 0,
            }
        );
    }

    #[test]
    fn missing_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.geo");
        match Region::load(&path) {
            Err(GeoError::File { path: p, .. }) => assert_eq!(p, path),
            other => panic!("expected File error, got {other:?}"),
        }
    }
}
