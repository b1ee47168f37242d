// Error type for geodata loading, parsing, and height queries.
//
// Pathfinding never returns these to callers: a failed search is `None`,
// and the pathfinder logs the error at debug level. What does surface is
// (a) load-time failures, which are fatal for the file involved, and
// (b) out-of-range above/below height queries, which mean the caller assumed
// a terrain shape the cell does not have.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum GeoError {
    #[error("I/O error on {path}: {source}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unknown block type tag 0x{tag:02X} for block {block}")]
    UnknownBlockType { tag: u16, block: usize },

    #[error("no layer {direction} height {z} at cell ({x}, {y})")]
    NoLayer {
        x: i32,
        y: i32,
        z: i32,
        direction: LayerDirection,
    },

    #[error("search endpoints {distance} cells apart do not fit a {size}x{size} node buffer")]
    OutsideBuffer { size: usize, distance: i32 },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl GeoError {
    /// Attach a file path to a bare I/O error; other variants pass through.
    pub fn at_path(self, path: impl Into<PathBuf>) -> Self {
        match self {
            GeoError::Io(source) => GeoError::File {
                path: path.into(),
                source,
            },
            other => other,
        }
    }
}

/// Which side of the query height an out-of-range lookup was searching.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LayerDirection {
    Above,
    Below,
}

impl std::fmt::Display for LayerDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LayerDirection::Above => f.write_str("above"),
            LayerDirection::Below => f.write_str("below"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn at_path_wraps_io_only() {
        let io = GeoError::Io(std::io::Error::other("boom"));
        match io.at_path("/tmp/20_20.geo") {
            GeoError::File { path, .. } => assert!(path.ends_with("20_20.geo")),
            other => panic!("expected File, got {other:?}"),
        }

        let tag = GeoError::UnknownBlockType { tag: 7, block: 3 };
        assert!(matches!(
            tag.at_path("x"),
            GeoError::UnknownBlockType { tag: 7, block: 3 }
        ));
    }

    #[test]
    fn no_layer_message_names_direction() {
        let err = GeoError::NoLayer {
            x: 1,
            y: 2,
            z: -40,
            direction: LayerDirection::Below,
        };
        assert_eq!(err.to_string(), "no layer below height -40 at cell (1, 2)");
    }
}
