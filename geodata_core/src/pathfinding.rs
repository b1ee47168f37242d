// Path queries: search, waypoint construction, smoothing.
//
// `PathFinder::find_path` is the entry point AI movement uses. It converts
// the endpoints into geo space, borrows a node buffer from the pool, runs
// the A* search, and turns the resulting cell route into a short list of
// world-space waypoints:
//
// 1. `construct_path` keeps only the cells where the step direction changes
//    (plus the final cell), so a straight corridor becomes one waypoint.
// 2. `smooth` slides a window (A, B, C) over the waypoints, starting with A
//    at the origin: if a straight walk from A reaches C and no closed door
//    lies on the segment, B is dropped; otherwise A advances to B. Every consecutive pair in the result is
//    therefore walkable in a straight line, which is exactly what the
//    movement code will do with it.
//
// The last waypoint carries the caller's exact target x/y rather than the
// cell centre. Failures of any kind come back as `None`; the reason is
// logged at debug level and counted per caller kind.
//
// The checker's obstacle table is handed to the search as well, so the cell
// route never steps through a closed door either.
//
// See also: `node_buffer.rs` for the search, `pool.rs` for buffer lending,
// `check.rs` for the straight-walk test used by smoothing.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crate::check::Checker;
use crate::geo::GeoData;
use crate::node_buffer::SearchParams;
use crate::pool::{BufferPool, PoolStats};
use crate::types::{GeoPos, Location};

/// Extra cells of margin around the endpoints in the search window.
pub const SEARCH_MARGIN: usize = 64;

#[derive(Debug, Default)]
struct PathCounters {
    player_found: AtomicU64,
    player_failed: AtomicU64,
    npc_found: AtomicU64,
    npc_failed: AtomicU64,
}

impl PathCounters {
    fn record(&self, is_player: bool, found: bool) {
        let counter = match (is_player, found) {
            (true, true) => &self.player_found,
            (true, false) => &self.player_failed,
            (false, true) => &self.npc_found,
            (false, false) => &self.npc_failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

#[derive(Debug)]
pub struct PathFinder {
    geo: Arc<GeoData>,
    checker: Checker,
    pool: Arc<BufferPool>,
    params: SearchParams,
    counters: PathCounters,
}

impl PathFinder {
    pub fn new(checker: Checker, pool: Arc<BufferPool>, params: SearchParams) -> Self {
        Self {
            geo: Arc::clone(checker.geo()),
            checker,
            pool,
            params,
            counters: PathCounters::default(),
        }
    }

    pub fn pool(&self) -> &BufferPool {
        &self.pool
    }

    /// Waypoints from `origin` to `target`, origin excluded. Empty when both
    /// are in the same cell; `None` when there is no route.
    pub fn find_path(&self, origin: Location, target: Location, is_player: bool) -> Option<Vec<Location>> {
        let result = self.search(origin, target, is_player);
        self.counters.record(is_player, result.is_some());
        result
    }

    fn search(&self, origin: Location, target: Location, is_player: bool) -> Option<Vec<Location>> {
        let start = self.geo.geo_pos(origin);
        let goal = self.geo.geo_pos(target);
        if !self.geo.has_geo_pos(start.x, start.y) || !self.geo.has_geo_pos(goal.x, goal.y) {
            tracing::debug!(%origin, %target, "path endpoint without geodata");
            return None;
        }
        if start.same_cell(goal) {
            return Some(Vec::new());
        }

        let required = SEARCH_MARGIN + 2 * start.chebyshev_distance(goal) as usize;
        let mut buffer = self.pool.acquire(required, is_player)?;
        let started = Instant::now();
        let outcome = buffer.search(&self.geo, self.checker.obstacles(), &self.params, start, goal);
        self.pool.record_elapsed(buffer.tier(), started.elapsed());

        let route = match outcome {
            Ok(Some(end)) => buffer.route(end),
            Ok(None) => {
                tracing::debug!(%origin, %target, iterations = buffer.iterations(), "no path found");
                return None;
            }
            Err(err) => {
                tracing::debug!(%origin, %target, error = %err, "path search failed");
                return None;
            }
        };
        drop(buffer);

        let mut waypoints = construct_path(&route);
        self.smooth(start, &mut waypoints);

        let mut path: Vec<Location> = waypoints.iter().map(|&pos| self.geo.location(pos)).collect();
        if let Some(last) = path.last_mut() {
            last.x = target.x;
            last.y = target.y;
        }
        tracing::trace!(%origin, %target, cells = route.len(), waypoints = path.len(), "path found");
        Some(path)
    }

    /// Drop every waypoint that a straight, unobstructed walk can skip.
    pub fn smooth(&self, origin: GeoPos, waypoints: &mut Vec<GeoPos>) {
        let mut anchor = origin;
        let mut index = 0;
        while index + 1 < waypoints.len() {
            let next = waypoints[index + 1];
            if self.checker.can_walk_between(anchor, next) {
                waypoints.remove(index);
            } else {
                anchor = waypoints[index];
                index += 1;
            }
        }
    }

    pub fn stats(&self) -> PathStats {
        PathStats {
            player_found: self.counters.player_found.load(Ordering::Relaxed),
            player_failed: self.counters.player_failed.load(Ordering::Relaxed),
            npc_found: self.counters.npc_found.load(Ordering::Relaxed),
            npc_failed: self.counters.npc_failed.load(Ordering::Relaxed),
            pool: self.pool.stats(),
        }
    }
}

/// Reduce a cell route (origin first) to the cells where the direction of
/// travel changes, plus the last cell. The origin itself is not included.
pub fn construct_path(route: &[GeoPos]) -> Vec<GeoPos> {
    let direction = |a: GeoPos, b: GeoPos| (b.x - a.x, b.y - a.y);
    let mut waypoints = Vec::new();
    for i in 1..route.len() {
        let is_last = i + 1 == route.len();
        if is_last || direction(route[i - 1], route[i]) != direction(route[i], route[i + 1]) {
            waypoints.push(route[i]);
        }
    }
    waypoints
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PathStats {
    pub player_found: u64,
    pub player_failed: u64,
    pub npc_found: u64,
    pub npc_failed: u64,
    pub pool: PoolStats,
}

impl fmt::Display for PathStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "paths: player {} found / {} failed, npc {} found / {} failed",
            self.player_found, self.player_failed, self.npc_found, self.npc_failed
        )?;
        write!(f, "{}", self.pool)
    }
}
