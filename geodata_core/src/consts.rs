// Grid geometry constants.
//
// The world is split into regions (one file each), regions into blocks, and
// blocks into cells. The ratios are fixed by the on-disk format and every
// other module derives its indexing from them.
//
//   region = 256 x 256 blocks = 2048 x 2048 cells = 32768 x 32768 world units
//   block  =   8 x   8 cells
//   cell   =  16 x  16 world units
//
// See also: `config.rs` for `WorldLayout`, which places region (0, 0) in
// world space.

// ---------------------------------------------------------------------------
// Cell
// ---------------------------------------------------------------------------

/// Edge length of one cell in world units.
pub const CELL_SIZE: i32 = 16;

/// Vertical quantum of stored heights in world units.
pub const CELL_HEIGHT: i32 = 8;

/// Number of vertical cells a character may drop without being blocked.
pub const IGNORE_CELLS_VERTICAL: i32 = 6;

/// Height window above a cell used when deriving diagonal flags: a character
/// can step down a ledge this tall but cannot climb one.
pub const CELL_IGNORE_HEIGHT: i32 = IGNORE_CELLS_VERTICAL * CELL_HEIGHT;

// ---------------------------------------------------------------------------
// Block
// ---------------------------------------------------------------------------

pub const BLOCK_CELLS_X: i32 = 8;
pub const BLOCK_CELLS_Y: i32 = 8;
pub const BLOCK_CELLS: usize = (BLOCK_CELLS_X * BLOCK_CELLS_Y) as usize;

// ---------------------------------------------------------------------------
// Region
// ---------------------------------------------------------------------------

pub const REGION_BLOCKS_X: i32 = 256;
pub const REGION_BLOCKS_Y: i32 = 256;
pub const REGION_BLOCKS: usize = (REGION_BLOCKS_X * REGION_BLOCKS_Y) as usize;

pub const REGION_CELLS_X: i32 = REGION_BLOCKS_X * BLOCK_CELLS_X;
pub const REGION_CELLS_Y: i32 = REGION_BLOCKS_Y * BLOCK_CELLS_Y;

/// Edge length of one region in world units.
pub const REGION_WORLD_SIZE: i32 = REGION_CELLS_X * CELL_SIZE;

// ---------------------------------------------------------------------------
// Checks
// ---------------------------------------------------------------------------

/// Default line-of-sight tolerance: terrain may rise this far above the sight
/// line before it blocks vision.
pub const MAX_OBSTACLE_HEIGHT: i32 = 32;

// ---------------------------------------------------------------------------
// Unified file format block tags
// ---------------------------------------------------------------------------

pub const TAG_FLAT: u8 = 0xD0;
pub const TAG_COMPLEX: u8 = 0xD1;
pub const TAG_MULTILAYER: u8 = 0xD2;
