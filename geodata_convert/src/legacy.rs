// Readers for the two legacy geodata layouts.
//
// Both layouts describe the same 256x256-block region as the unified format
// but differ in framing:
//
// - `Compact`: no header; each block starts with a one-byte tag (0 flat,
//   1 complex, 2 multilayer). Flat blocks carry a raw i16 height; complex
//   blocks 64 packed words; multilayer blocks a u8 layer count per cell
//   followed by that many packed words.
// - `HeaderPrefixed`: an 18-byte header whose first two bytes repeat the
//   region's tile x/y; each block starts with an i16 tag (0x0000 flat,
//   0x0040 complex, anything else multilayer). Flat blocks carry two i16s
//   of which only the first is the height; layer counts are i16.
//
// A packed word holds a cell layer in 16 bits: the low nibble is the four
// cardinal NSWE flags, the upper 12 bits are the height in half units
// (`height = (word & 0xFFF0) >> 1`, arithmetic shift). Legacy data carries no
// diagonal flags; `diagonal.rs` derives them after loading.
//
// Everything is little-endian. Output is a core `Region`, so the converter
// and the runtime share one `Block` type; multilayer cells are sorted by
// `Block::multilayer`.
//
// See also: `batch.rs` which drives these readers per tile, and
// `geodata_core::region` for the unified writer.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt};
use geodata_core::GeoError;
use geodata_core::block::{Block, CellLayers, Layer};
use geodata_core::consts::{BLOCK_CELLS, REGION_BLOCKS};
use geodata_core::nswe::Nswe;
use geodata_core::region::Region;

use crate::error::ConvertError;

pub const HEADER_LEN: usize = 18;

pub const COMPACT_TAG_FLAT: u8 = 0;
pub const COMPACT_TAG_COMPLEX: u8 = 1;
pub const COMPACT_TAG_MULTILAYER: u8 = 2;

pub const HEADER_TAG_FLAT: i16 = 0x0000;
pub const HEADER_TAG_COMPLEX: i16 = 0x0040;

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum LegacyFormat {
    /// One-byte block tags, no file header.
    Compact,
    /// 18-byte file header, two-byte block tags.
    #[value(name = "header")]
    HeaderPrefixed,
}

impl LegacyFormat {
    /// Conventional input file name pattern for this layout.
    pub fn default_pattern(self) -> &'static str {
        match self {
            LegacyFormat::Compact => "{x}_{y}.l2j",
            LegacyFormat::HeaderPrefixed => "{x}_{y}_conv.dat",
        }
    }
}

/// Unpack a legacy cell word into a layer (cardinal flags only).
pub fn decode_word(word: i16) -> Layer {
    Layer::new((word & !0x000F) >> 1, Nswe((word & 0x000F) as u8))
}

/// Pack a layer into a legacy cell word. Lossy: heights lose their lowest
/// three bits and diagonal flags are dropped.
pub fn encode_word(layer: Layer) -> i16 {
    ((layer.height << 1) & !0x000F) | i16::from(layer.nswe.cardinal().bits())
}

/// Read one block in the given layout. `block` is only used for errors.
pub fn read_block<R: Read>(reader: &mut R, format: LegacyFormat, block: usize) -> Result<Block, ConvertError> {
    match format {
        LegacyFormat::Compact => match reader.read_u8()? {
            COMPACT_TAG_FLAT => Ok(Block::Flat {
                height: reader.read_i16::<LittleEndian>()?,
            }),
            COMPACT_TAG_COMPLEX => read_complex(reader),
            COMPACT_TAG_MULTILAYER => read_multilayer(reader, |r| Ok(usize::from(r.read_u8()?))),
            other => Err(ConvertError::UnknownLegacyTag {
                tag: u16::from(other),
                block,
            }),
        },
        LegacyFormat::HeaderPrefixed => match reader.read_i16::<LittleEndian>()? {
            HEADER_TAG_FLAT => {
                let height = reader.read_i16::<LittleEndian>()?;
                let _ = reader.read_i16::<LittleEndian>()?;
                Ok(Block::Flat { height })
            }
            HEADER_TAG_COMPLEX => read_complex(reader),
            _ => read_multilayer(reader, |r| {
                let count = r.read_i16::<LittleEndian>()?;
                usize::try_from(count).map_err(|_| ConvertError::BadLayerCount { count, block })
            }),
        },
    }
}

fn read_complex<R: Read>(reader: &mut R) -> Result<Block, ConvertError> {
    let mut block = Block::complex_filled(0, Nswe::NONE);
    for index in 0..BLOCK_CELLS {
        block.cell_layers_mut(index)[0] = decode_word(reader.read_i16::<LittleEndian>()?);
    }
    Ok(block)
}

fn read_multilayer<R: Read>(
    reader: &mut R,
    read_count: impl Fn(&mut R) -> Result<usize, ConvertError>,
) -> Result<Block, ConvertError> {
    let mut cells = Vec::with_capacity(BLOCK_CELLS);
    for _ in 0..BLOCK_CELLS {
        let count = read_count(reader)?;
        let mut layers = CellLayers::with_capacity(count);
        for _ in 0..count {
            layers.push(decode_word(reader.read_i16::<LittleEndian>()?));
        }
        cells.push(layers);
    }
    Ok(Block::multilayer(cells))
}

/// Read a whole region. `tile` is the tile the file name claims; with
/// `strict_header` a disagreeing header is an error, otherwise a warning.
pub fn read_region<R: Read>(
    reader: &mut R,
    format: LegacyFormat,
    tile: (i32, i32),
    strict_header: bool,
) -> Result<Region, ConvertError> {
    if format == LegacyFormat::HeaderPrefixed {
        let mut header = [0u8; HEADER_LEN];
        reader.read_exact(&mut header)?;
        check_header(header[0], header[1], tile, strict_header)?;
    }
    let mut blocks = Vec::with_capacity(REGION_BLOCKS);
    for index in 0..REGION_BLOCKS {
        blocks.push(read_block(reader, format, index)?);
    }
    Ok(Region::from_blocks(blocks))
}

fn check_header(header_x: u8, header_y: u8, tile: (i32, i32), strict: bool) -> Result<(), ConvertError> {
    let (tile_x, tile_y) = tile;
    if i32::from(header_x) == tile_x && i32::from(header_y) == tile_y {
        return Ok(());
    }
    let mismatch = ConvertError::HeaderMismatch {
        header_x,
        header_y,
        tile_x,
        tile_y,
    };
    if strict {
        return Err(mismatch);
    }
    tracing::warn!("{mismatch}");
    Ok(())
}

/// Open and read a legacy region file.
pub fn load_region(
    path: &Path,
    format: LegacyFormat,
    tile: (i32, i32),
    strict_header: bool,
) -> Result<Region, ConvertError> {
    let file = File::open(path).map_err(|e| GeoError::Io(e).at_path(path))?;
    let mut reader = BufReader::new(file);
    let region = read_region(&mut reader, format, tile, strict_header)?;
    let mut trailing = [0u8; 1];
    if reader.read(&mut trailing)? > 0 {
        tracing::warn!(path = %path.display(), "trailing data after last legacy block ignored");
    }
    Ok(region)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn words(layers: &[Layer]) -> Vec<u8> {
        layers
            .iter()
            .flat_map(|layer| encode_word(*layer).to_le_bytes())
            .collect()
    }

    #[test]
    fn word_decoding() {
        // Height 104 is word 0x00D0, flags in the low nibble.
        assert_eq!(decode_word(0x00C0 | 0x0F), Layer::new(96, Nswe::CARDINAL));
        assert_eq!(decode_word(0x00D0 | 0x01), Layer::new(104, Nswe::E));
        // Negative heights use an arithmetic shift.
        assert_eq!(decode_word(-32 | 0x08), Layer::new(-16, Nswe::N));
        assert_eq!(decode_word(i16::MIN), Layer::new(-16384, Nswe::NONE));
    }

    #[test]
    fn word_encoding_drops_low_bits_and_diagonals() {
        let layer = Layer::new(-1203, Nswe::ALL);
        let back = decode_word(encode_word(layer));
        assert_eq!(back.nswe, Nswe::CARDINAL);
        assert_eq!(back.height, -1208);
        assert_eq!(decode_word(encode_word(Layer::new(400, Nswe::W))), Layer::new(400, Nswe::W));
    }

    #[test]
    fn compact_blocks() {
        let mut buf = vec![COMPACT_TAG_FLAT];
        buf.extend_from_slice(&(-700i16).to_le_bytes());
        assert_eq!(
            read_block(&mut Cursor::new(&buf), LegacyFormat::Compact, 0).unwrap(),
            Block::Flat { height: -700 }
        );

        let mut buf = vec![COMPACT_TAG_COMPLEX];
        buf.extend(words(&[Layer::new(16, Nswe::S); BLOCK_CELLS]));
        assert_eq!(
            read_block(&mut Cursor::new(&buf), LegacyFormat::Compact, 0).unwrap(),
            Block::complex_filled(16, Nswe::S)
        );
    }

    #[test]
    fn compact_multilayer_is_sorted() {
        let mut buf = vec![COMPACT_TAG_MULTILAYER];
        for _ in 0..BLOCK_CELLS {
            buf.push(2);
            buf.extend(words(&[Layer::new(320, Nswe::N), Layer::new(-48, Nswe::E)]));
        }
        let block = read_block(&mut Cursor::new(&buf), LegacyFormat::Compact, 0).unwrap();
        assert_eq!(block.kind(), "multilayer");
        assert_eq!(
            block.cell_layers(10),
            &[Layer::new(-48, Nswe::E), Layer::new(320, Nswe::N)]
        );
    }

    #[test]
    fn compact_unknown_tag_is_fatal() {
        let err = read_block(&mut Cursor::new(vec![9u8, 0, 0]), LegacyFormat::Compact, 44).unwrap_err();
        assert!(matches!(err, ConvertError::UnknownLegacyTag { tag: 9, block: 44 }));
    }

    #[test]
    fn header_blocks() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&HEADER_TAG_FLAT.to_le_bytes());
        buf.extend_from_slice(&250i16.to_le_bytes());
        buf.extend_from_slice(&999i16.to_le_bytes());
        assert_eq!(
            read_block(&mut Cursor::new(&buf), LegacyFormat::HeaderPrefixed, 0).unwrap(),
            Block::Flat { height: 250 }
        );

        let mut buf = Vec::new();
        buf.extend_from_slice(&HEADER_TAG_COMPLEX.to_le_bytes());
        buf.extend(words(&[Layer::new(-8, Nswe::W | Nswe::N); BLOCK_CELLS]));
        assert_eq!(
            read_block(&mut Cursor::new(&buf), LegacyFormat::HeaderPrefixed, 0).unwrap(),
            Block::complex_filled(-8, Nswe::W | Nswe::N)
        );
    }

    #[test]
    fn header_any_other_tag_is_multilayer() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&0x0048i16.to_le_bytes());
        for cell in 0..BLOCK_CELLS {
            let count = (cell % 3) as i16;
            buf.extend_from_slice(&count.to_le_bytes());
            for layer in 0..count {
                buf.extend(words(&[Layer::new(layer * 200, Nswe::CARDINAL)]));
            }
        }
        let block = read_block(&mut Cursor::new(&buf), LegacyFormat::HeaderPrefixed, 0).unwrap();
        assert_eq!(block.cell_layers(0).len(), 0);
        assert_eq!(block.cell_layers(2).len(), 2);
        assert_eq!(block.height_nearest(0, 2, 180), 200);
    }

    #[test]
    fn header_negative_count_is_rejected() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&0x0048i16.to_le_bytes());
        buf.extend_from_slice(&(-2i16).to_le_bytes());
        let err = read_block(&mut Cursor::new(&buf), LegacyFormat::HeaderPrefixed, 3).unwrap_err();
        assert!(matches!(err, ConvertError::BadLayerCount { count: -2, block: 3 }));
    }

    #[test]
    fn header_mismatch_strict_and_lenient() {
        assert!(check_header(22, 19, (22, 19), true).is_ok());
        assert!(check_header(22, 19, (22, 20), false).is_ok());
        assert!(matches!(
            check_header(22, 19, (22, 20), true),
            Err(ConvertError::HeaderMismatch {
                header_x: 22,
                header_y: 19,
                tile_x: 22,
                tile_y: 20
            })
        ));
    }

    #[test]
    fn truncated_region_is_io_error() {
        let mut buf = vec![0u8; HEADER_LEN];
        buf[0] = 20;
        buf[1] = 18;
        buf.extend_from_slice(&HEADER_TAG_FLAT.to_le_bytes());
        let err = read_region(&mut Cursor::new(&buf), LegacyFormat::HeaderPrefixed, (20, 18), true).unwrap_err();
        assert!(matches!(err, ConvertError::Io(_)));
    }

    #[test]
    fn compact_region_of_flat_blocks() {
        let mut buf = Vec::with_capacity(REGION_BLOCKS * 3);
        for _ in 0..REGION_BLOCKS {
            buf.push(COMPACT_TAG_FLAT);
            buf.extend_from_slice(&64i16.to_le_bytes());
        }
        let region = read_region(&mut Cursor::new(&buf), LegacyFormat::Compact, (0, 0), false).unwrap();
        assert_eq!(region, Region::flat(64));
    }
}
