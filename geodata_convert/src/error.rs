// Error type for legacy geodata conversion.
//
// Every variant is fatal for the region being converted but never for the
// batch: `batch::convert_all` logs the error and moves on to the next tile.

use geodata_core::GeoError;

#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    #[error(transparent)]
    Geo(#[from] GeoError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unknown legacy block tag 0x{tag:04X} for block {block}")]
    UnknownLegacyTag { tag: u16, block: usize },

    #[error("negative layer count {count} in block {block}")]
    BadLayerCount { count: i16, block: usize },

    #[error("header names region {header_x}_{header_y}, file name says {tile_x}_{tile_y}")]
    HeaderMismatch {
        header_x: u8,
        header_y: u8,
        tile_x: i32,
        tile_y: i32,
    },
}
