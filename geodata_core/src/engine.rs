// `GeoEngine`: the one object a server holds for all geodata queries.
//
// Bundles the loaded `GeoData`, a `Checker`, and a `PathFinder` backed by a
// `BufferPool`, all built from one `GeoConfig`. Everything inside is either
// immutable or internally synchronised, so a single engine behind an `Arc`
// (or a `&'static`) serves every thread.
//
// See also: `config.rs` for what is tunable, `check.rs` and `pathfinding.rs`
// for the query semantics this file only forwards.

use std::sync::Arc;

use crate::check::Checker;
use crate::config::GeoConfig;
use crate::error::GeoError;
use crate::geo::GeoData;
use crate::node_buffer::SearchParams;
use crate::obstacle::ObstacleTable;
use crate::pathfinding::{PathFinder, PathStats};
use crate::pool::BufferPool;
use crate::types::Location;

#[derive(Debug)]
pub struct GeoEngine {
    config: GeoConfig,
    geo: Arc<GeoData>,
    pool: Arc<BufferPool>,
    checker: Checker,
    pathfinder: PathFinder,
}

fn search_params(config: &GeoConfig) -> SearchParams {
    SearchParams {
        rules: config.move_rules,
        max_iterations: config.max_iterations,
        obstacle_penalty: config.obstacle_penalty,
    }
}

impl GeoEngine {
    /// Load region files named by `config` and build the engine.
    pub fn load(config: GeoConfig) -> Result<Self, GeoError> {
        let geo = GeoData::load(&config)?;
        Self::with_data(Arc::new(geo), config)
    }

    /// Build around already-loaded data (tools, tests).
    pub fn with_data(geo: Arc<GeoData>, config: GeoConfig) -> Result<Self, GeoError> {
        let pool = Arc::new(BufferPool::new(&config.tiers()?));
        let checker = Checker::new(Arc::clone(&geo), config.move_rules)
            .with_max_obstacle_height(config.max_obstacle_height);
        let pathfinder = PathFinder::new(checker.clone(), Arc::clone(&pool), search_params(&config));
        tracing::info!(
            rules = ?config.move_rules,
            tiers = %config.buffer_tiers,
            pathfinding = config.pathfinding_enabled,
            "geo engine ready"
        );
        Ok(Self {
            config,
            geo,
            pool,
            checker,
            pathfinder,
        })
    }

    /// Route checks through a door/obstacle table. Rebuilds the pathfinder
    /// so that its search and smoothing see the same obstacles.
    pub fn with_obstacles(self, obstacles: Arc<dyn ObstacleTable>) -> Self {
        let params = search_params(&self.config);
        let pool = Arc::clone(&self.pool);
        let checker = self.checker.with_obstacles(obstacles);
        Self {
            pathfinder: PathFinder::new(checker.clone(), pool, params),
            checker,
            ..self
        }
    }

    pub fn config(&self) -> &GeoConfig {
        &self.config
    }

    pub fn geo(&self) -> &Arc<GeoData> {
        &self.geo
    }

    pub fn checker(&self) -> &Checker {
        &self.checker
    }

    pub fn pathfinder(&self) -> &PathFinder {
        &self.pathfinder
    }

    /// Ground height under a world location (nearest layer to its z).
    pub fn height(&self, loc: Location) -> i32 {
        self.geo.geo_pos(loc).z
    }

    pub fn find_path(&self, origin: Location, target: Location, is_player: bool) -> Option<Vec<Location>> {
        if !self.config.pathfinding_enabled {
            return None;
        }
        self.pathfinder.find_path(origin, target, is_player)
    }

    pub fn can_see_target(&self, origin: Location, origin_height: i32, target: Location, target_height: i32) -> bool {
        self.checker
            .can_see_target(origin, origin_height, target, target_height)
    }

    pub fn can_move_to_target(&self, origin: Location, target: Location) -> bool {
        self.checker.can_move_to_target(origin, target)
    }

    pub fn can_move_to_target_loc(&self, origin: Location, target: Location) -> Location {
        self.checker.can_move_to_target_loc(origin, target)
    }

    pub fn stats(&self) -> PathStats {
        self.pathfinder.stats()
    }
}
