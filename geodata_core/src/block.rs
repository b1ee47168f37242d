// Block storage: one 8x8 patch of cells.
//
// A `Block` is one of four variants, chosen per block by the converter to
// match the terrain it describes:
//
// - `Null`:       no survey data. Height is whatever the caller asked for and
//                 every direction is open. This is a deliberate fail-open
//                 policy for unsurveyed areas.
// - `Flat`:       a single height for all 64 cells, no obstacles.
// - `Complex`:    one `(height, nswe)` layer per cell.
// - `Multilayer`: a variable stack of layers per cell (bridges, buildings
//                 with several floors).
//
// The same enum is used by the runtime facade and by the offline converter,
// so height/NSWE lookups are a flat `match` on the hot path.
//
// Multilayer lookups assume each cell's layers are sorted ascending by
// height. Every constructor and reader sorts, so the invariant holds for any
// input.
//
// Cells inside a block are indexed x-major: `cx * BLOCK_CELLS_Y + cy`. The
// unified on-disk codec (`read`/`write`) lives here too; see `region.rs` for
// the file-level layout.

use std::io::{self, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use smallvec::SmallVec;

use crate::consts::{BLOCK_CELLS, BLOCK_CELLS_X, BLOCK_CELLS_Y, TAG_COMPLEX, TAG_FLAT, TAG_MULTILAYER};
use crate::error::{GeoError, LayerDirection};
use crate::nswe::Nswe;

/// One walkable plane of a cell.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Layer {
    pub height: i16,
    pub nswe: Nswe,
}

impl Layer {
    pub const fn new(height: i16, nswe: Nswe) -> Self {
        Self { height, nswe }
    }
}

/// The layers of one multilayer cell. Most cells have one or two.
pub type CellLayers = SmallVec<[Layer; 4]>;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Block {
    #[default]
    Null,
    Flat {
        height: i16,
    },
    Complex(Box<[Layer; BLOCK_CELLS]>),
    /// Always exactly `BLOCK_CELLS` entries, each sorted ascending.
    Multilayer(Box<[CellLayers]>),
}

/// Index of a geo cell inside its block.
pub fn cell_index(geo_x: i32, geo_y: i32) -> usize {
    (geo_x.rem_euclid(BLOCK_CELLS_X) * BLOCK_CELLS_Y + geo_y.rem_euclid(BLOCK_CELLS_Y)) as usize
}

impl Block {
    /// A complex block with every cell at the same height and flags.
    pub fn complex_filled(height: i16, nswe: Nswe) -> Self {
        Block::Complex(Box::new([Layer::new(height, nswe); BLOCK_CELLS]))
    }

    /// Build a multilayer block, sorting each cell's layers.
    ///
    /// Panics if `cells.len() != BLOCK_CELLS`.
    pub fn multilayer(cells: Vec<CellLayers>) -> Self {
        assert_eq!(cells.len(), BLOCK_CELLS, "multilayer block needs 64 cells");
        let mut cells = cells.into_boxed_slice();
        for cell in cells.iter_mut() {
            sort_layers(cell);
        }
        Block::Multilayer(cells)
    }

    pub fn has_geo_pos(&self) -> bool {
        !matches!(self, Block::Null)
    }

    /// Short variant name for logs and load statistics.
    pub fn kind(&self) -> &'static str {
        match self {
            Block::Null => "null",
            Block::Flat { .. } => "flat",
            Block::Complex(_) => "complex",
            Block::Multilayer(_) => "multilayer",
        }
    }

    // -----------------------------------------------------------------------
    // Height queries
    // -----------------------------------------------------------------------

    /// Height of the layer closest to `z`.
    pub fn height_nearest(&self, geo_x: i32, geo_y: i32, z: i32) -> i32 {
        match self {
            Block::Null => z,
            Block::Flat { height } => i32::from(*height),
            Block::Complex(cells) => i32::from(cells[cell_index(geo_x, geo_y)].height),
            Block::Multilayer(cells) => nearest_layer(&cells[cell_index(geo_x, geo_y)], z)
                .map_or(z, |layer| i32::from(layer.height)),
        }
    }

    /// Height of the closest layer strictly above `z`, or
    /// `GeoError::NoLayer` if there is none. Flat and Complex cells have a
    /// single layer, which only counts when it is on the right side of `z`.
    /// Null answers with `z` itself.
    pub fn height_above(&self, geo_x: i32, geo_y: i32, z: i32) -> Result<i32, GeoError> {
        let layer = match self {
            Block::Null => return Ok(z),
            Block::Flat { height } => layer_above(&[Layer::new(*height, Nswe::ALL)], z),
            _ => layer_above(self.cell_layers(cell_index(geo_x, geo_y)), z),
        };
        layer.map(|layer| i32::from(layer.height)).ok_or(GeoError::NoLayer {
            x: geo_x,
            y: geo_y,
            z,
            direction: LayerDirection::Above,
        })
    }

    /// Height of the closest layer strictly below `z`. Same rules as
    /// `height_above`.
    pub fn height_below(&self, geo_x: i32, geo_y: i32, z: i32) -> Result<i32, GeoError> {
        let layer = match self {
            Block::Null => return Ok(z),
            Block::Flat { height } => layer_below(&[Layer::new(*height, Nswe::ALL)], z),
            _ => layer_below(self.cell_layers(cell_index(geo_x, geo_y)), z),
        };
        layer.map(|layer| i32::from(layer.height)).ok_or(GeoError::NoLayer {
            x: geo_x,
            y: geo_y,
            z,
            direction: LayerDirection::Below,
        })
    }

    // -----------------------------------------------------------------------
    // NSWE queries
    // -----------------------------------------------------------------------

    /// Flags of the layer closest to `z`.
    pub fn nswe_nearest(&self, geo_x: i32, geo_y: i32, z: i32) -> Nswe {
        match self {
            Block::Null | Block::Flat { .. } => Nswe::ALL,
            Block::Complex(cells) => cells[cell_index(geo_x, geo_y)].nswe,
            Block::Multilayer(cells) => nearest_layer(&cells[cell_index(geo_x, geo_y)], z)
                .map_or(Nswe::NONE, |layer| layer.nswe),
        }
    }

    /// Flags of the closest layer strictly below `z`, or `None` if the cell
    /// has no such layer.
    pub fn nswe_below(&self, geo_x: i32, geo_y: i32, z: i32) -> Option<Nswe> {
        match self {
            Block::Null => Some(Nswe::ALL),
            Block::Flat { height } => (i32::from(*height) < z).then_some(Nswe::ALL),
            _ => layer_below(self.cell_layers(cell_index(geo_x, geo_y)), z).map(|layer| layer.nswe),
        }
    }

    // -----------------------------------------------------------------------
    // Layer access (converter and tests)
    // -----------------------------------------------------------------------

    /// Stored layers of a cell. Empty for `Null` and `Flat`, which store none.
    pub fn cell_layers(&self, index: usize) -> &[Layer] {
        match self {
            Block::Null | Block::Flat { .. } => &[],
            Block::Complex(cells) => std::slice::from_ref(&cells[index]),
            Block::Multilayer(cells) => &cells[index],
        }
    }

    /// Mutable access to a cell's stored layers. Only flags should be changed
    /// through this; changing heights can break the multilayer sort order.
    pub fn cell_layers_mut(&mut self, index: usize) -> &mut [Layer] {
        match self {
            Block::Null | Block::Flat { .. } => &mut [],
            Block::Complex(cells) => std::slice::from_mut(&mut cells[index]),
            Block::Multilayer(cells) => &mut cells[index],
        }
    }

    // -----------------------------------------------------------------------
    // Unified codec
    // -----------------------------------------------------------------------

    /// Read one block (tag + payload). `block` is the block's index in the
    /// region, used only for error reporting.
    pub fn read<R: Read>(reader: &mut R, block: usize) -> Result<Block, GeoError> {
        let tag = reader.read_u8()?;
        match tag {
            TAG_FLAT => Ok(Block::Flat {
                height: reader.read_i16::<LittleEndian>()?,
            }),
            TAG_COMPLEX => {
                let mut cells = Box::new([Layer::default(); BLOCK_CELLS]);
                for cell in cells.iter_mut() {
                    *cell = read_layer(reader)?;
                }
                Ok(Block::Complex(cells))
            }
            TAG_MULTILAYER => {
                let mut cells = Vec::with_capacity(BLOCK_CELLS);
                for _ in 0..BLOCK_CELLS {
                    let count = reader.read_u8()?;
                    let mut layers = CellLayers::with_capacity(count as usize);
                    for _ in 0..count {
                        layers.push(read_layer(reader)?);
                    }
                    cells.push(layers);
                }
                Ok(Block::multilayer(cells))
            }
            other => Err(GeoError::UnknownBlockType {
                tag: u16::from(other),
                block,
            }),
        }
    }

    /// Write one block (tag + payload). `Null` blocks have no on-disk form.
    pub fn write<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        match self {
            Block::Null => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "null block has no on-disk representation",
                ));
            }
            Block::Flat { height } => {
                writer.write_u8(TAG_FLAT)?;
                writer.write_i16::<LittleEndian>(*height)?;
            }
            Block::Complex(cells) => {
                writer.write_u8(TAG_COMPLEX)?;
                for layer in cells.iter() {
                    write_layer(writer, *layer)?;
                }
            }
            Block::Multilayer(cells) => {
                writer.write_u8(TAG_MULTILAYER)?;
                for layers in cells.iter() {
                    let count = u8::try_from(layers.len()).map_err(|_| {
                        io::Error::new(
                            io::ErrorKind::InvalidInput,
                            format!("cell has {} layers (max 255)", layers.len()),
                        )
                    })?;
                    writer.write_u8(count)?;
                    for layer in layers {
                        write_layer(writer, *layer)?;
                    }
                }
            }
        }
        Ok(())
    }
}

fn read_layer<R: Read>(reader: &mut R) -> io::Result<Layer> {
    let nswe = Nswe(reader.read_u8()?);
    let height = reader.read_i16::<LittleEndian>()?;
    Ok(Layer { height, nswe })
}

fn write_layer<W: Write>(writer: &mut W, layer: Layer) -> io::Result<()> {
    writer.write_u8(layer.nswe.bits())?;
    writer.write_i16::<LittleEndian>(layer.height)
}

/// Sort a cell's layers ascending by height (stable).
pub fn sort_layers(layers: &mut [Layer]) {
    layers.sort_by_key(|layer| layer.height);
}

/// Linear scan over ascending layers: distances shrink while approaching `z`
/// and grow once past it, so stop at the first growth and take the previous
/// layer. A scan that never turns around ends on the topmost layer, not the
/// first one.
fn nearest_layer(layers: &[Layer], z: i32) -> Option<Layer> {
    let mut best = *layers.first()?;
    let mut limit = i32::MAX;
    for layer in layers {
        let distance = (i32::from(layer.height) - z).abs();
        if distance > limit {
            break;
        }
        limit = distance;
        best = *layer;
    }
    Some(best)
}

fn layer_below(layers: &[Layer], z: i32) -> Option<Layer> {
    layers
        .iter()
        .take_while(|layer| i32::from(layer.height) < z)
        .last()
        .copied()
}

fn layer_above(layers: &[Layer], z: i32) -> Option<Layer> {
    layers
        .iter()
        .find(|layer| i32::from(layer.height) > z)
        .copied()
}
