// NSWE passability flags.
//
// Each cell (or cell layer) carries one byte saying in which directions a
// character may leave it. The low nibble holds the four cardinal directions
// and comes straight from surveyed data; the high nibble holds the diagonals,
// which are never measured and are derived offline by the converter.
//
// Axis convention: east is +x, south is +y (so north is -y).

use std::fmt;

/// 8-bit set of passable directions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Nswe(pub u8);

impl Nswe {
    pub const NONE: Nswe = Nswe(0x00);
    pub const E: Nswe = Nswe(0x01);
    pub const W: Nswe = Nswe(0x02);
    pub const S: Nswe = Nswe(0x04);
    pub const N: Nswe = Nswe(0x08);
    pub const SE: Nswe = Nswe(0x10);
    pub const SW: Nswe = Nswe(0x20);
    pub const NE: Nswe = Nswe(0x40);
    pub const NW: Nswe = Nswe(0x80);

    /// All four cardinal directions.
    pub const CARDINAL: Nswe = Nswe(0x0F);
    /// All eight directions.
    pub const ALL: Nswe = Nswe(0xFF);

    pub const fn bits(self) -> u8 {
        self.0
    }

    /// True if every flag in `other` is set.
    pub const fn contains(self, other: Nswe) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn union(self, other: Nswe) -> Nswe {
        Nswe(self.0 | other.0)
    }

    /// Only the surveyed (cardinal) flags.
    pub const fn cardinal(self) -> Nswe {
        Nswe(self.0 & Self::CARDINAL.0)
    }

    /// Only the derived (diagonal) flags.
    pub const fn diagonal(self) -> Nswe {
        Nswe(self.0 & !Self::CARDINAL.0)
    }

    /// Direction flag for a unit step. Returns `NONE` for `(0, 0)`.
    pub fn from_step(dx: i32, dy: i32) -> Nswe {
        match (dx.signum(), dy.signum()) {
            (1, 0) => Nswe::E,
            (-1, 0) => Nswe::W,
            (0, 1) => Nswe::S,
            (0, -1) => Nswe::N,
            (1, 1) => Nswe::SE,
            (-1, 1) => Nswe::SW,
            (1, -1) => Nswe::NE,
            (-1, -1) => Nswe::NW,
            _ => Nswe::NONE,
        }
    }

    /// Split a step into its horizontal and vertical cardinal components.
    /// Either half is `NONE` when that axis does not move.
    pub fn components(dx: i32, dy: i32) -> (Nswe, Nswe) {
        (Nswe::from_step(dx, 0), Nswe::from_step(0, dy))
    }
}

impl std::ops::BitOr for Nswe {
    type Output = Nswe;

    fn bitor(self, rhs: Nswe) -> Nswe {
        self.union(rhs)
    }
}

impl std::ops::BitOrAssign for Nswe {
    fn bitor_assign(&mut self, rhs: Nswe) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for Nswe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(Nswe, &str); 8] = [
            (Nswe::N, "N"),
            (Nswe::S, "S"),
            (Nswe::W, "W"),
            (Nswe::E, "E"),
            (Nswe::NW, "NW"),
            (Nswe::NE, "NE"),
            (Nswe::SW, "SW"),
            (Nswe::SE, "SE"),
        ];
        if self.0 == 0 {
            return f.write_str("-");
        }
        let mut first = true;
        for (flag, name) in NAMES {
            if self.contains(flag) {
                if !first {
                    f.write_str("|")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_directions() {
        assert_eq!(Nswe::from_step(1, 0), Nswe::E);
        assert_eq!(Nswe::from_step(0, -3), Nswe::N);
        assert_eq!(Nswe::from_step(-1, 1), Nswe::SW);
        assert_eq!(Nswe::from_step(0, 0), Nswe::NONE);
    }

    #[test]
    fn components_of_diagonal() {
        assert_eq!(Nswe::components(-1, -1), (Nswe::W, Nswe::N));
        assert_eq!(Nswe::components(1, 0), (Nswe::E, Nswe::NONE));
    }

    #[test]
    fn cardinal_and_diagonal_masks() {
        let all = Nswe::ALL;
        assert_eq!(all.cardinal(), Nswe::CARDINAL);
        assert_eq!(all.diagonal().bits(), 0xF0);
        assert!(all.contains(Nswe::NW | Nswe::E));
        assert!(!Nswe::CARDINAL.contains(Nswe::NE));
    }

    #[test]
    fn display_lists_flags() {
        assert_eq!((Nswe::N | Nswe::E).to_string(), "N|E");
        assert_eq!(Nswe::NONE.to_string(), "-");
    }
}
