// Dynamic obstacles layered over static geodata.
//
// Geodata describes terrain as surveyed; doors and similar gameplay objects
// open and close at runtime and are not in it. The checker consults an
// `ObstacleTable` before any terrain test: if the table says the segment is
// blocked, the move or sight line is refused outright.
//
// `DoorTable` is the stock implementation: a fixed set of axis-aligned boxes
// registered at startup, each with an atomic open flag that gameplay code
// toggles from any thread. Closed doors block any segment that passes through
// their box (slab test); open doors are ignored.
//
// See also: `check.rs` which calls `blocks` first on every query.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::types::Location;

pub trait ObstacleTable: Send + Sync {
    /// True if something other than terrain blocks the straight segment
    /// from `from` to `to` (world space).
    fn blocks(&self, from: Location, to: Location) -> bool;
}

/// Terrain only.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoObstacles;

impl ObstacleTable for NoObstacles {
    fn blocks(&self, _from: Location, _to: Location) -> bool {
        false
    }
}

// ---------------------------------------------------------------------------
// Doors
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct Door {
    pub id: u32,
    /// Inclusive lower corner.
    pub min: Location,
    /// Inclusive upper corner.
    pub max: Location,
    open: AtomicBool,
}

impl Door {
    pub fn new(id: u32, a: Location, b: Location, open: bool) -> Self {
        Self {
            id,
            min: Location::new(a.x.min(b.x), a.y.min(b.y), a.z.min(b.z)),
            max: Location::new(a.x.max(b.x), a.y.max(b.y), a.z.max(b.z)),
            open: AtomicBool::new(open),
        }
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    pub fn set_open(&self, open: bool) {
        self.open.store(open, Ordering::Release);
    }

    /// Slab test of the segment against the box.
    pub fn intersects(&self, from: Location, to: Location) -> bool {
        let axes = [
            (from.x, to.x, self.min.x, self.max.x),
            (from.y, to.y, self.min.y, self.max.y),
            (from.z, to.z, self.min.z, self.max.z),
        ];
        let (mut t_enter, mut t_exit) = (0.0f64, 1.0f64);
        for (start, end, lo, hi) in axes {
            let (start, end, lo, hi) = (f64::from(start), f64::from(end), f64::from(lo), f64::from(hi));
            let delta = end - start;
            if delta == 0.0 {
                if start < lo || start > hi {
                    return false;
                }
                continue;
            }
            let (mut t0, mut t1) = ((lo - start) / delta, (hi - start) / delta);
            if t0 > t1 {
                std::mem::swap(&mut t0, &mut t1);
            }
            t_enter = t_enter.max(t0);
            t_exit = t_exit.min(t1);
            if t_enter > t_exit {
                return false;
            }
        }
        true
    }
}

/// A fixed set of doors. The set is built once; only open flags change.
#[derive(Debug, Default)]
pub struct DoorTable {
    doors: Vec<Door>,
}

impl DoorTable {
    pub fn new(doors: Vec<Door>) -> Self {
        Self { doors }
    }

    pub fn doors(&self) -> &[Door] {
        &self.doors
    }

    pub fn door(&self, id: u32) -> Option<&Door> {
        self.doors.iter().find(|door| door.id == id)
    }

    /// Open or close a door. Returns false for an unknown id.
    pub fn set_open(&self, id: u32, open: bool) -> bool {
        match self.door(id) {
            Some(door) => {
                door.set_open(open);
                tracing::trace!(door = id, open, "door state changed");
                true
            }
            None => false,
        }
    }
}

impl ObstacleTable for DoorTable {
    fn blocks(&self, from: Location, to: Location) -> bool {
        self.doors
            .iter()
            .any(|door| !door.is_open() && door.intersects(from, to))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn gate() -> DoorTable {
        DoorTable::new(vec![Door::new(
            7,
            Location::new(100, -50, 0),
            Location::new(110, 50, 200),
            false,
        )])
    }

    #[test]
    fn closed_door_blocks_crossing_segment() {
        let table = gate();
        assert!(table.blocks(Location::new(0, 0, 10), Location::new(300, 0, 10)));
        // Passes beside the door.
        assert!(!table.blocks(Location::new(0, 100, 10), Location::new(300, 100, 10)));
        // Stops short of it.
        assert!(!table.blocks(Location::new(0, 0, 10), Location::new(90, 0, 10)));
        // Passes over it.
        assert!(!table.blocks(Location::new(0, 0, 300), Location::new(300, 0, 300)));
    }

    #[test]
    fn open_door_does_not_block() {
        let table = gate();
        assert!(table.set_open(7, true));
        assert!(!table.blocks(Location::new(0, 0, 10), Location::new(300, 0, 10)));
        assert!(!table.set_open(99, true));
    }

    #[test]
    fn diagonal_segment_through_corner() {
        let door = Door::new(1, Location::new(0, 0, 0), Location::new(10, 10, 10), false);
        assert!(door.intersects(Location::new(-5, -5, 5), Location::new(15, 15, 5)));
        assert!(!door.intersects(Location::new(-5, 20, 5), Location::new(20, 30, 5)));
    }

    #[test]
    fn toggle_from_another_thread() {
        let table = Arc::new(gate());
        let writer = Arc::clone(&table);
        std::thread::spawn(move || writer.set_open(7, true)).join().unwrap();
        assert!(table.door(7).unwrap().is_open());
    }

    #[test]
    fn no_obstacles_never_blocks() {
        assert!(!NoObstacles.blocks(Location::new(0, 0, 0), Location::new(1, 1, 1)));
    }
}
