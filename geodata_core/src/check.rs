// Straight-line movement and line-of-sight checks.
//
// `Checker` answers the two questions AI and movement code ask every tick:
// "how far can I walk toward that point in a straight line?" and "can I see
// it?". Both walk the grid cell by cell along a Bresenham line.
//
// Movement (`check_move`) steps from the origin toward the target and stops
// at the last cell whose exit flag for the next step is missing, or whose
// next step crosses a closed door. Whether a
// diagonal step is allowed depends on `MoveRules`:
// - `Cardinal`: the data has no diagonal flags, so a diagonal step is allowed
//   if either corner route around it is open (own vertical flag plus the
//   vertical neighbour's horizontal flag, or the other way round).
// - `Diagonal`: the converter has already baked that rule into the diagonal
//   flags; check the one bit.
// `step_allowed` is shared with the A* expansion in `node_buffer.rs` so the
// pathfinder and the checker always agree on what a legal step is.
//
// Sight (`check_see`) is symmetric: both ends advance toward the middle at
// once, so swapping viewer and target never changes the answer. The sight
// line height is interpolated between the two eyes, and terrain may poke
// above it by at most `max_obstacle_height`.
//
// Endpoints without geodata fail open: moves go through untouched and sight
// is allowed. The obstacle table (doors) is consulted before terrain by the
// `Location` queries, and per step by `check_move`.
//
// See also: `geo.rs` for the lookups used here, `obstacle.rs` for the door
// collaborator, `pathfinding.rs` which uses `can_walk_between` to smooth
// paths.

use std::sync::Arc;

use crate::config::MoveRules;
use crate::consts::MAX_OBSTACLE_HEIGHT;
use crate::geo::GeoData;
use crate::nswe::Nswe;
use crate::obstacle::{NoObstacles, ObstacleTable};
use crate::types::{GeoPos, Location};

/// Whether a single step of `(dx, dy)` (each -1, 0 or 1) out of the cell at
/// `(x, y)` on the layer nearest `z` is allowed.
pub fn step_allowed(geo: &GeoData, rules: MoveRules, x: i32, y: i32, z: i32, dx: i32, dy: i32) -> bool {
    let nswe = geo.nswe_nearest(x, y, z);
    if dx == 0 || dy == 0 || rules == MoveRules::Diagonal {
        return nswe.contains(Nswe::from_step(dx, dy));
    }
    let (horizontal, vertical) = Nswe::components(dx, dy);
    (nswe.contains(vertical) && geo.nswe_nearest(x, y + dy, z).contains(horizontal))
        || (nswe.contains(horizontal) && geo.nswe_nearest(x + dx, y, z).contains(vertical))
}

// ---------------------------------------------------------------------------
// Bresenham
// ---------------------------------------------------------------------------

/// Cells of a grid line, excluding the start and including the end. A step
/// moves both axes at once where the line is diagonal.
#[derive(Clone, Debug)]
pub struct GridLine {
    x: i32,
    y: i32,
    end_x: i32,
    end_y: i32,
    dx: i32,
    dy: i32,
    sx: i32,
    sy: i32,
    err: i32,
}

impl GridLine {
    pub fn new(x: i32, y: i32, end_x: i32, end_y: i32) -> Self {
        let dx = (end_x - x).abs();
        let dy = (end_y - y).abs();
        Self {
            x,
            y,
            end_x,
            end_y,
            dx,
            dy,
            sx: (end_x - x).signum(),
            sy: (end_y - y).signum(),
            err: dx - dy,
        }
    }
}

impl Iterator for GridLine {
    type Item = (i32, i32);

    fn next(&mut self) -> Option<(i32, i32)> {
        if self.x == self.end_x && self.y == self.end_y {
            return None;
        }
        let e2 = 2 * self.err;
        if e2 > -self.dy {
            self.err -= self.dy;
            self.x += self.sx;
        }
        if e2 < self.dx {
            self.err += self.dx;
            self.y += self.sy;
        }
        Some((self.x, self.y))
    }
}

// ---------------------------------------------------------------------------
// Checker
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct Checker {
    geo: Arc<GeoData>,
    rules: MoveRules,
    obstacles: Arc<dyn ObstacleTable>,
    max_obstacle_height: i32,
}

impl std::fmt::Debug for Checker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Checker")
            .field("rules", &self.rules)
            .field("max_obstacle_height", &self.max_obstacle_height)
            .finish_non_exhaustive()
    }
}

impl Checker {
    pub fn new(geo: Arc<GeoData>, rules: MoveRules) -> Self {
        Self {
            geo,
            rules,
            obstacles: Arc::new(NoObstacles),
            max_obstacle_height: MAX_OBSTACLE_HEIGHT,
        }
    }

    pub fn with_obstacles(mut self, obstacles: Arc<dyn ObstacleTable>) -> Self {
        self.obstacles = obstacles;
        self
    }

    pub fn with_max_obstacle_height(mut self, height: i32) -> Self {
        self.max_obstacle_height = height;
        self
    }

    pub fn geo(&self) -> &Arc<GeoData> {
        &self.geo
    }

    pub fn rules(&self) -> MoveRules {
        self.rules
    }

    pub fn obstacles(&self) -> &dyn ObstacleTable {
        self.obstacles.as_ref()
    }

    pub fn can_step(&self, x: i32, y: i32, z: i32, dx: i32, dy: i32) -> bool {
        step_allowed(&self.geo, self.rules, x, y, z, dx, dy)
    }

    /// Walk from `origin` toward `(target_x, target_y)` and return the last
    /// cell reached, with the layer height it was reached on.
    pub fn check_move(&self, origin: GeoPos, target_x: i32, target_y: i32) -> GeoPos {
        let mut current = origin;
        for (x, y) in GridLine::new(origin.x, origin.y, target_x, target_y) {
            let (dx, dy) = (x - current.x, y - current.y);
            if !self.can_step(current.x, current.y, current.z, dx, dy) {
                tracing::trace!(from = %current, dx, dy, "move blocked");
                break;
            }
            let next = GeoPos::new(x, y, self.geo.height_nearest(x, y, current.z));
            if self.obstacles.blocks(self.geo.location(current), self.geo.location(next)) {
                tracing::trace!(from = %current, dx, dy, "move blocked by obstacle");
                break;
            }
            current = next;
        }
        current
    }

    /// True if a straight walk between two cell centres arrives at `to`
    /// exactly, with no obstacle on the segment joining them.
    pub fn can_walk_between(&self, from: GeoPos, to: GeoPos) -> bool {
        !self.obstacles.blocks(self.geo.location(from), self.geo.location(to))
            && self.check_move(from, to.x, to.y) == to
    }

    /// Line of sight between two eye positions (cells plus eye height).
    pub fn check_see(&self, origin: GeoPos, target: GeoPos) -> bool {
        let steps = origin.chebyshev_distance(target);
        if steps <= 1 {
            return true;
        }
        // Weighted so that swapping the ends gives the same height per cell.
        let sight_z = |position: i32| {
            let weighted = i64::from(origin.z) * i64::from(steps - position)
                + i64::from(target.z) * i64::from(position);
            weighted.div_euclid(i64::from(steps)) as i32
        };
        let half = steps / 2;
        let front = GridLine::new(origin.x, origin.y, target.x, target.y)
            .take(half as usize)
            .zip(1..);
        let back = GridLine::new(target.x, target.y, origin.x, origin.y)
            .take(half as usize)
            .zip(1..)
            .map(|(cell, k)| (cell, steps - k));
        for ((x, y), position) in front.chain(back) {
            let sight = sight_z(position);
            let terrain = self.geo.height_nearest(x, y, sight);
            if terrain - sight > self.max_obstacle_height {
                tracing::trace!(x, y, terrain, sight, "sight blocked");
                return false;
            }
        }
        true
    }

    /// Line of sight between two entities standing at `origin` and `target`,
    /// eyes `origin_height` / `target_height` above their ground.
    pub fn can_see_target(&self, origin: Location, origin_height: i32, target: Location, target_height: i32) -> bool {
        let start = self.geo.geo_pos(origin);
        let end = self.geo.geo_pos(target);
        let eye_from = Location::new(origin.x, origin.y, start.z + origin_height);
        let eye_to = Location::new(target.x, target.y, end.z + target_height);
        if self.obstacles.blocks(eye_from, eye_to) {
            return false;
        }
        if !self.geo.has_geo_pos(start.x, start.y) || !self.geo.has_geo_pos(end.x, end.y) {
            return true;
        }
        self.check_see(
            GeoPos::new(start.x, start.y, eye_from.z),
            GeoPos::new(end.x, end.y, eye_to.z),
        )
    }

    /// True if walking straight from `origin` reaches `target` on the same
    /// floor.
    pub fn can_move_to_target(&self, origin: Location, target: Location) -> bool {
        if self.obstacles.blocks(origin, target) {
            return false;
        }
        match self.walk(origin, target) {
            Walk::NoGeodata => true,
            Walk::Arrived { same_floor, .. } => same_floor,
            Walk::Stopped(_) => false,
        }
    }

    /// Where a straight walk from `origin` toward `target` ends:
    /// - reached on the target's floor: the target, at that floor's height;
    /// - reached on another floor: the origin, at its floor's height;
    /// - blocked: the centre of the last reachable cell.
    pub fn can_move_to_target_loc(&self, origin: Location, target: Location) -> Location {
        if self.obstacles.blocks(origin, target) {
            return origin;
        }
        match self.walk(origin, target) {
            Walk::NoGeodata => target,
            Walk::Arrived {
                same_floor: true,
                target_z,
                ..
            } => target.with_z(target_z),
            Walk::Arrived { origin_z, .. } => origin.with_z(origin_z),
            Walk::Stopped(last) => self.geo.location(last),
        }
    }

    fn walk(&self, origin: Location, target: Location) -> Walk {
        let start = self.geo.geo_pos(origin);
        let end = self.geo.geo_pos(target);
        if !self.geo.has_geo_pos(start.x, start.y) || !self.geo.has_geo_pos(end.x, end.y) {
            return Walk::NoGeodata;
        }
        let reached = self.check_move(start, end.x, end.y);
        if reached.same_cell(end) {
            Walk::Arrived {
                same_floor: reached.z == end.z,
                origin_z: start.z,
                target_z: end.z,
            }
        } else {
            Walk::Stopped(reached)
        }
    }
}

enum Walk {
    NoGeodata,
    Arrived {
        same_floor: bool,
        origin_z: i32,
        target_z: i32,
    },
    Stopped(GeoPos),
}
