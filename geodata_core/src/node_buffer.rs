// Scratch space and A* search for one path query.
//
// A `NodeBuffer` is a square window of `size x size` cells centred on the
// midpoint between origin and target. Each cell has one `Node` slot in a
// flat `Vec`, so neighbour lookup is index arithmetic and nothing is
// allocated during a search. Buffers are reused across searches (see
// `pool.rs`); only the nodes touched by the previous search are reset.
//
// The search itself is textbook A* over the 8-connected grid:
// - open set: `BinaryHeap` with reversed ordering (min-heap on f, ties to
//   the higher g so the search dives toward the goal);
// - step cost 10 cardinal, 14 diagonal, plus `obstacle_penalty` for entering
//   a cell that is not open in all four cardinal directions;
// - heuristic: octile distance with the same 10/14 weights (admissible);
// - legality of each step: `check::step_allowed`, the same rule the checker
//   uses, with heights following `height_nearest`, and no closed obstacle
//   on the segment between the two cell centres.
// The search succeeds when the target cell is popped at a height within
// `CELL_IGNORE_HEIGHT` of the target's, and gives up after `max_iterations`
// expansions or when the open set runs dry.
//
// See also: `pool.rs` which owns and lends buffers, `pathfinding.rs` which
// turns the terminal node into waypoints.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::check::step_allowed;
use crate::config::MoveRules;
use crate::consts::CELL_IGNORE_HEIGHT;
use crate::error::GeoError;
use crate::geo::GeoData;
use crate::nswe::Nswe;
use crate::obstacle::ObstacleTable;
use crate::types::GeoPos;

const COST_CARDINAL: u32 = 10;
const COST_DIAGONAL: u32 = 14;

const NEIGHBOURS: [(i32, i32); 8] = [
    (0, -1),
    (1, 0),
    (0, 1),
    (-1, 0),
    (1, -1),
    (1, 1),
    (-1, 1),
    (-1, -1),
];

/// Per-search tunables, taken from `GeoConfig`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SearchParams {
    pub rules: MoveRules,
    pub max_iterations: usize,
    pub obstacle_penalty: u32,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            rules: MoveRules::Diagonal,
            max_iterations: 3500,
            obstacle_penalty: 10,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum NodeState {
    #[default]
    Unvisited,
    Open,
    Closed,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Node {
    pub x: i32,
    pub y: i32,
    pub z: i32,
    /// Flags of the layer the node sits on.
    pub nswe: Nswe,
    pub g: u32,
    pub f: u32,
    /// Buffer index of the node this one was reached from.
    pub parent: Option<u32>,
    pub state: NodeState,
}

impl Node {
    pub fn pos(&self) -> GeoPos {
        GeoPos::new(self.x, self.y, self.z)
    }
}

/// Entry in the open set (min-heap via reversed ordering).
#[derive(Debug)]
struct OpenEntry {
    index: u32,
    f: u32,
    g: u32,
}

impl PartialEq for OpenEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for OpenEntry {}

impl PartialOrd for OpenEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OpenEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Smallest f is "greatest"; among equal f prefer the deeper node.
        other
            .f
            .cmp(&self.f)
            .then_with(|| self.g.cmp(&other.g))
            .then_with(|| other.index.cmp(&self.index))
    }
}

fn octile(ax: i32, ay: i32, bx: i32, by: i32) -> u32 {
    let dx = ax.abs_diff(bx);
    let dy = ay.abs_diff(by);
    let (short, long) = (dx.min(dy), dx.max(dy));
    COST_DIAGONAL * short + COST_CARDINAL * (long - short)
}

#[derive(Debug)]
pub struct NodeBuffer {
    size: usize,
    /// Allocated on first use; `size * size` entries after that.
    nodes: Vec<Node>,
    touched: Vec<u32>,
    open: BinaryHeap<OpenEntry>,
    base_x: i32,
    base_y: i32,
    /// Expansions performed by the last search.
    iterations: usize,
}

impl NodeBuffer {
    pub fn new(size: usize) -> Self {
        Self {
            size,
            nodes: Vec::new(),
            touched: Vec::new(),
            open: BinaryHeap::new(),
            base_x: 0,
            base_y: 0,
            iterations: 0,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn node(&self, index: u32) -> &Node {
        &self.nodes[index as usize]
    }

    /// Buffer index of a geo cell, if it lies inside the current window.
    fn index_of(&self, x: i32, y: i32) -> Option<u32> {
        let (lx, ly) = (x - self.base_x, y - self.base_y);
        let size = self.size as i32;
        if lx < 0 || ly < 0 || lx >= size || ly >= size {
            return None;
        }
        Some((lx * size + ly) as u32)
    }

    fn reset(&mut self) {
        if self.nodes.is_empty() {
            self.nodes = vec![Node::default(); self.size * self.size];
        }
        for &index in &self.touched {
            self.nodes[index as usize] = Node::default();
        }
        self.touched.clear();
        self.open.clear();
        self.iterations = 0;
    }

    /// Run A* from `origin` to `target`. Returns the buffer index of the
    /// node that reached the target, or `None` when there is no route within
    /// the iteration budget.
    pub fn search(
        &mut self,
        geo: &GeoData,
        obstacles: &dyn ObstacleTable,
        params: &SearchParams,
        origin: GeoPos,
        target: GeoPos,
    ) -> Result<Option<u32>, GeoError> {
        self.reset();
        let half = self.size as i32 / 2;
        self.base_x = (origin.x + target.x).div_euclid(2) - half;
        self.base_y = (origin.y + target.y).div_euclid(2) - half;

        let start = self.index_of(origin.x, origin.y);
        let goal = self.index_of(target.x, target.y);
        let (Some(start), Some(_)) = (start, goal) else {
            return Err(GeoError::OutsideBuffer {
                size: self.size,
                distance: origin.chebyshev_distance(target),
            });
        };

        let h = octile(origin.x, origin.y, target.x, target.y);
        self.nodes[start as usize] = Node {
            x: origin.x,
            y: origin.y,
            z: origin.z,
            nswe: geo.nswe_nearest(origin.x, origin.y, origin.z),
            g: 0,
            f: h,
            parent: None,
            state: NodeState::Open,
        };
        self.touched.push(start);
        self.open.push(OpenEntry { index: start, f: h, g: 0 });

        while let Some(entry) = self.open.pop() {
            let current = self.nodes[entry.index as usize];
            if current.state == NodeState::Closed || entry.g != current.g {
                continue;
            }
            if current.x == target.x
                && current.y == target.y
                && (current.z - target.z).abs() <= CELL_IGNORE_HEIGHT
            {
                return Ok(Some(entry.index));
            }
            if self.iterations >= params.max_iterations {
                tracing::trace!(iterations = self.iterations, "search budget exhausted");
                return Ok(None);
            }
            self.iterations += 1;
            self.nodes[entry.index as usize].state = NodeState::Closed;
            self.expand(geo, obstacles, params, entry.index, current, target);
        }
        Ok(None)
    }

    fn expand(
        &mut self,
        geo: &GeoData,
        obstacles: &dyn ObstacleTable,
        params: &SearchParams,
        index: u32,
        current: Node,
        target: GeoPos,
    ) {
        for (dx, dy) in NEIGHBOURS {
            let (nx, ny) = (current.x + dx, current.y + dy);
            let Some(neighbour) = self.index_of(nx, ny) else {
                continue;
            };
            if self.nodes[neighbour as usize].state == NodeState::Closed {
                continue;
            }
            if !step_allowed(geo, params.rules, current.x, current.y, current.z, dx, dy) {
                continue;
            }
            let nz = geo.height_nearest(nx, ny, current.z);
            if obstacles.blocks(geo.location(current.pos()), geo.location(GeoPos::new(nx, ny, nz))) {
                continue;
            }
            let nswe = geo.nswe_nearest(nx, ny, nz);
            let mut cost = if dx != 0 && dy != 0 {
                COST_DIAGONAL
            } else {
                COST_CARDINAL
            };
            if !nswe.contains(Nswe::CARDINAL) {
                cost += params.obstacle_penalty;
            }
            let g = current.g + cost;

            let node = &mut self.nodes[neighbour as usize];
            match node.state {
                NodeState::Open if g >= node.g => continue,
                NodeState::Unvisited => self.touched.push(neighbour),
                _ => {}
            }
            let f = g + octile(nx, ny, target.x, target.y);
            *node = Node {
                x: nx,
                y: ny,
                z: nz,
                nswe,
                g,
                f,
                parent: Some(index),
                state: NodeState::Open,
            };
            self.open.push(OpenEntry { index: neighbour, f, g });
        }
    }

    /// Cells from the search origin to the node at `index`, inclusive.
    pub fn route(&self, index: u32) -> Vec<GeoPos> {
        let mut route = Vec::new();
        let mut cursor = Some(index);
        while let Some(i) = cursor {
            let node = &self.nodes[i as usize];
            route.push(node.pos());
            cursor = node.parent;
        }
        route.reverse();
        route
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::Layer;
    use crate::config::WorldLayout;
    use crate::obstacle::{Door, DoorTable, NoObstacles};
    use crate::region::Region;
    use crate::types::Location;

    fn world(region: Region) -> GeoData {
        GeoData::from_regions(WorldLayout::origin_grid(1, 1), [((0, 0), region)]).unwrap()
    }

    fn is_connected(route: &[GeoPos]) -> bool {
        route
            .windows(2)
            .all(|w| w[0].chebyshev_distance(w[1]) == 1)
    }

    #[test]
    fn open_ground_straight_route() {
        let geo = world(Region::flat(0));
        let mut buffer = NodeBuffer::new(100);
        let origin = GeoPos::new(10, 10, 0);
        let target = GeoPos::new(30, 10, 0);
        let end = buffer
            .search(&geo, &NoObstacles, &SearchParams::default(), origin, target)
            .unwrap()
            .unwrap();
        let route = buffer.route(end);
        assert_eq!(route.first(), Some(&origin));
        assert_eq!(route.last(), Some(&target));
        assert_eq!(route.len(), 21);
        assert!(route.iter().all(|p| p.y == 10));
        assert_eq!(buffer.node(end).g, 200);
    }

    #[test]
    fn diagonal_route_costs_fourteen_per_step() {
        let geo = world(Region::flat(0));
        let mut buffer = NodeBuffer::new(80);
        let end = buffer
            .search(&geo, &NoObstacles, &SearchParams::default(), GeoPos::new(5, 5, 0), GeoPos::new(12, 12, 0))
            .unwrap()
            .unwrap();
        assert_eq!(buffer.node(end).g, 7 * 14);
        assert_eq!(buffer.route(end).len(), 8);
    }

    #[test]
    fn routes_around_wall_gap() {
        // Column 20 is sealed from both sides except at row 40.
        let mut region = Region::flat(0);
        for y in 0..80 {
            if y == 40 {
                continue;
            }
            region.set_complex_cell(19, y, Layer::new(0, Nswe(0xFF & !(0x01 | 0x10 | 0x40))));
            region.set_complex_cell(20, y, Layer::new(0, Nswe::NONE));
            region.set_complex_cell(21, y, Layer::new(0, Nswe(0xFF & !(0x02 | 0x20 | 0x80))));
        }
        let geo = world(region);
        let mut buffer = NodeBuffer::new(128);
        let params = SearchParams {
            max_iterations: 20_000,
            ..SearchParams::default()
        };
        let end = buffer
            .search(&geo, &NoObstacles, &params, GeoPos::new(10, 30, 0), GeoPos::new(30, 30, 0))
            .unwrap()
            .expect("route through the gap");
        let route = buffer.route(end);
        assert!(is_connected(&route));
        assert!(route.iter().any(|p| p.x == 20 && p.y == 40));
        assert!(route.iter().all(|p| p.x != 20 || p.y == 40));
    }

    #[test]
    fn routes_around_closed_door() {
        // Covers the centres of column 20 from above the window down to row 20.
        let doors = DoorTable::new(vec![Door::new(
            7,
            Location::new(320, -1000, -100),
            Location::new(336, 336, 100),
            false,
        )]);
        let geo = world(Region::flat(0));
        let mut buffer = NodeBuffer::new(100);
        let (origin, target) = (GeoPos::new(10, 10, 0), GeoPos::new(30, 10, 0));
        let end = buffer
            .search(&geo, &doors, &SearchParams::default(), origin, target)
            .unwrap()
            .expect("route around the door");
        let route = buffer.route(end);
        assert!(is_connected(&route));
        assert!(route.iter().all(|p| p.x != 20 || p.y > 20));
        assert!(
            route
                .windows(2)
                .all(|w| !doors.blocks(geo.location(w[0]), geo.location(w[1])))
        );

        doors.set_open(7, true);
        let end = buffer
            .search(&geo, &doors, &SearchParams::default(), origin, target)
            .unwrap()
            .unwrap();
        assert_eq!(buffer.route(end).len(), 21);
    }

    #[test]
    fn sealed_target_has_no_route() {
        let mut region = Region::flat(0);
        // Ring of cells that cannot be left toward (15, 15).
        for x in 13..=17 {
            for y in 13..=17 {
                if (x, y) != (15, 15) {
                    region.set_complex_cell(x, y, Layer::new(0, Nswe::NONE));
                }
            }
        }
        let geo = world(region);
        let mut buffer = NodeBuffer::new(64);
        let found = buffer
            .search(&geo, &NoObstacles, &SearchParams::default(), GeoPos::new(5, 15, 0), GeoPos::new(15, 15, 0))
            .unwrap();
        assert_eq!(found, None);
    }

    #[test]
    fn iteration_budget_is_respected() {
        let geo = world(Region::flat(0));
        let mut buffer = NodeBuffer::new(200);
        let params = SearchParams {
            max_iterations: 5,
            ..SearchParams::default()
        };
        let found = buffer
            .search(&geo, &NoObstacles, &params, GeoPos::new(10, 10, 0), GeoPos::new(100, 90, 0))
            .unwrap();
        assert_eq!(found, None);
        assert_eq!(buffer.iterations(), 5);
    }

    #[test]
    fn buffer_is_reusable() {
        let geo = world(Region::flat(0));
        let mut buffer = NodeBuffer::new(64);
        let params = SearchParams::default();
        let first = buffer
            .search(&geo, &NoObstacles, &params, GeoPos::new(1, 1, 0), GeoPos::new(9, 1, 0))
            .unwrap()
            .unwrap();
        assert_eq!(buffer.route(first).len(), 9);
        let second = buffer
            .search(&geo, &NoObstacles, &params, GeoPos::new(50, 50, 0), GeoPos::new(50, 40, 0))
            .unwrap()
            .unwrap();
        let route = buffer.route(second);
        assert_eq!(route.len(), 11);
        assert_eq!(route[0], GeoPos::new(50, 50, 0));
    }

    #[test]
    fn endpoints_outside_window_are_an_error() {
        let geo = world(Region::flat(0));
        let mut buffer = NodeBuffer::new(16);
        let err = buffer
            .search(&geo, &NoObstacles, &SearchParams::default(), GeoPos::new(0, 0, 0), GeoPos::new(100, 0, 0))
            .unwrap_err();
        assert!(matches!(err, GeoError::OutsideBuffer { size: 16, distance: 100 }));
    }

    #[test]
    fn penalty_steers_away_from_wall_cells() {
        // A row of cells at y = 10 that are closed northward only. Walking
        // along it is legal but penalised, so the route leaves it at once.
        let mut region = Region::flat(0);
        for x in 0..40 {
            region.set_complex_cell(x, 10, Layer::new(0, Nswe(0xFF & !0x08)));
        }
        let geo = world(region);
        let mut buffer = NodeBuffer::new(80);
        let params = SearchParams {
            obstacle_penalty: 50,
            ..SearchParams::default()
        };
        let end = buffer
            .search(&geo, &NoObstacles, &params, GeoPos::new(5, 10, 0), GeoPos::new(30, 10, 0))
            .unwrap()
            .unwrap();
        let route = buffer.route(end);
        assert!(route[1..route.len() - 1].iter().all(|p| p.y != 10));
    }
}
