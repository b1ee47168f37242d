// Coordinate types shared across the engine.
//
// Two spaces are in play:
// - World space (`Location`): the units the rest of the server uses for
//   positions, 16 per cell horizontally.
// - Geo space (`GeoPos`): cell indices into the loaded grid, plus the height
//   of the layer the position sits on.
//
// Conversion between the two depends on `WorldLayout` (see `config.rs`) and
// is done by `GeoData`, never by hand.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A position in world space.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl Location {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Same position at a different height.
    pub const fn with_z(self, z: i32) -> Self {
        Self { z, ..self }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// A cell in geo space together with the layer height it refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GeoPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl GeoPos {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// True if both positions are the same cell, whatever the height.
    pub fn same_cell(self, other: GeoPos) -> bool {
        self.x == other.x && self.y == other.y
    }

    /// Chebyshev distance in cells.
    pub fn chebyshev_distance(self, other: GeoPos) -> i32 {
        (self.x - other.x).abs().max((self.y - other.y).abs())
    }
}

impl fmt::Display for GeoPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {} @ {}]", self.x, self.y, self.z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chebyshev_is_max_axis() {
        let a = GeoPos::new(0, 0, 0);
        let b = GeoPos::new(3, -7, 100);
        assert_eq!(a.chebyshev_distance(b), 7);
        assert_eq!(b.chebyshev_distance(a), 7);
    }

    #[test]
    fn same_cell_ignores_height() {
        assert!(GeoPos::new(4, 5, 0).same_cell(GeoPos::new(4, 5, -200)));
        assert!(!GeoPos::new(4, 5, 0).same_cell(GeoPos::new(5, 5, 0)));
    }

    #[test]
    fn location_serialization_roundtrip() {
        let loc = Location::new(-131072, 42, -3500);
        let json = serde_json::to_string(&loc).unwrap();
        let restored: Location = serde_json::from_str(&json).unwrap();
        assert_eq!(loc, restored);
    }
}
