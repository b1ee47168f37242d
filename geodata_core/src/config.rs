// Data-driven geodata configuration.
//
// `GeoConfig` holds every tunable the engine reads: where the region files
// live and how they are named, how the loaded grid sits in world space
// (`WorldLayout`), which step rules apply to diagonal movement, the node
// buffer pool tiers, and the search/line-of-sight limits. It is loaded from
// JSON at startup; every field has a default, so a partial file (or `{}`)
// is valid.
//
// Buffer pool tiers use a compact `SIZExCOUNT;SIZExCOUNT` string so they can
// be tuned in one line, e.g. `"100x6;128x6;192x6;256x4;320x4;384x4;500x2"`.
//
// See also: `geo.rs` which uses `WorldLayout` for coordinate conversion,
// `pool.rs` which is built from the parsed tiers, `engine.rs` which wires the
// whole config together.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::consts::{CELL_SIZE, MAX_OBSTACLE_HEIGHT, REGION_WORLD_SIZE};
use crate::error::GeoError;

// ---------------------------------------------------------------------------
// World layout
// ---------------------------------------------------------------------------

/// Placement of the region grid in world space.
///
/// Region files are named by tile coordinates; tile `(tile_x_min,
/// tile_y_min)` is region `(0, 0)` of the loaded grid and starts at world
/// `(world_x_min, world_y_min)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldLayout {
    pub tile_x_min: i32,
    pub tile_x_max: i32,
    pub tile_y_min: i32,
    pub tile_y_max: i32,
    pub world_x_min: i32,
    pub world_y_min: i32,
}

impl Default for WorldLayout {
    fn default() -> Self {
        Self {
            tile_x_min: 16,
            tile_x_max: 26,
            tile_y_min: 10,
            tile_y_max: 26,
            world_x_min: (16 - 20) * REGION_WORLD_SIZE,
            world_y_min: (10 - 18) * REGION_WORLD_SIZE,
        }
    }
}

impl WorldLayout {
    /// A grid of `count_x` by `count_y` tiles starting at tile `(0, 0)` with
    /// world origin `(0, 0)`. Handy for tools and tests.
    pub fn origin_grid(count_x: i32, count_y: i32) -> Self {
        Self {
            tile_x_min: 0,
            tile_x_max: count_x - 1,
            tile_y_min: 0,
            tile_y_max: count_y - 1,
            world_x_min: 0,
            world_y_min: 0,
        }
    }

    pub fn region_count_x(&self) -> i32 {
        self.tile_x_max - self.tile_x_min + 1
    }

    pub fn region_count_y(&self) -> i32 {
        self.tile_y_max - self.tile_y_min + 1
    }

    pub fn geo_x(&self, world_x: i32) -> i32 {
        (world_x - self.world_x_min).div_euclid(CELL_SIZE)
    }

    pub fn geo_y(&self, world_y: i32) -> i32 {
        (world_y - self.world_y_min).div_euclid(CELL_SIZE)
    }

    /// World x of the centre of geo column `geo_x`.
    pub fn world_x(&self, geo_x: i32) -> i32 {
        geo_x * CELL_SIZE + self.world_x_min + CELL_SIZE / 2
    }

    /// World y of the centre of geo row `geo_y`.
    pub fn world_y(&self, geo_y: i32) -> i32 {
        geo_y * CELL_SIZE + self.world_y_min + CELL_SIZE / 2
    }

    /// All tile coordinates, x-major.
    pub fn tiles(&self) -> impl Iterator<Item = (i32, i32)> + use<> {
        let (y_min, y_max) = (self.tile_y_min, self.tile_y_max);
        (self.tile_x_min..=self.tile_x_max).flat_map(move |x| (y_min..=y_max).map(move |y| (x, y)))
    }
}

/// Expand a file name pattern with `{x}`/`{y}` tile placeholders.
pub fn region_file_name(pattern: &str, tile_x: i32, tile_y: i32) -> String {
    pattern
        .replace("{x}", &tile_x.to_string())
        .replace("{y}", &tile_y.to_string())
}

// ---------------------------------------------------------------------------
// Movement rules
// ---------------------------------------------------------------------------

/// How diagonal steps are validated.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoveRules {
    /// Data carries only cardinal flags; a diagonal step is allowed if one of
    /// the two corner paths around it is open.
    Cardinal,
    /// Data carries derived diagonal flags; check them directly.
    #[default]
    Diagonal,
}

// ---------------------------------------------------------------------------
// Buffer tiers
// ---------------------------------------------------------------------------

/// One pool tier: `count` buffers each covering `size` x `size` cells.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BufferTierSpec {
    pub size: usize,
    pub count: usize,
}

impl FromStr for BufferTierSpec {
    type Err = GeoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (size, count) = s
            .trim()
            .split_once('x')
            .ok_or_else(|| GeoError::Config(format!("buffer tier '{s}' is not SIZExCOUNT")))?;
        let parse = |v: &str, what: &str| {
            v.trim()
                .parse::<usize>()
                .map_err(|e| GeoError::Config(format!("buffer tier '{s}': bad {what}: {e}")))
        };
        let spec = Self {
            size: parse(size, "size")?,
            count: parse(count, "count")?,
        };
        if spec.size == 0 {
            return Err(GeoError::Config(format!("buffer tier '{s}': size must be > 0")));
        }
        Ok(spec)
    }
}

/// Parse a `SIZExCOUNT;SIZExCOUNT` list, sorted ascending by size. Empty
/// entries (e.g. a trailing `;`) are skipped.
pub fn parse_buffer_tiers(spec: &str) -> Result<Vec<BufferTierSpec>, GeoError> {
    let mut tiers = spec
        .split(';')
        .filter(|part| !part.trim().is_empty())
        .map(str::parse)
        .collect::<Result<Vec<BufferTierSpec>, _>>()?;
    tiers.sort_by_key(|tier| tier.size);
    Ok(tiers)
}

// ---------------------------------------------------------------------------
// GeoConfig
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeoConfig {
    /// Directory holding the unified region files.
    pub geodata_path: PathBuf,
    /// Region file name pattern, `{x}`/`{y}` replaced by tile coordinates.
    pub file_pattern: String,
    pub layout: WorldLayout,
    pub move_rules: MoveRules,
    /// Node buffer pool tiers, `SIZExCOUNT;...`.
    pub buffer_tiers: String,
    /// Maximum number of nodes a single search may expand.
    pub max_iterations: usize,
    /// Extra cost for entering a cell that is not open in all cardinal
    /// directions; keeps routes from hugging walls.
    pub obstacle_penalty: u32,
    /// Line-of-sight tolerance in world units.
    pub max_obstacle_height: i32,
    /// When false, `GeoEngine::find_path` always returns `None`.
    pub pathfinding_enabled: bool,
}

impl Default for GeoConfig {
    fn default() -> Self {
        Self {
            geodata_path: PathBuf::from("data/geodata"),
            file_pattern: "{x}_{y}.geo".into(),
            layout: WorldLayout::default(),
            move_rules: MoveRules::default(),
            buffer_tiers: "100x6;128x6;192x6;256x4;320x4;384x4;500x2".into(),
            max_iterations: 3500,
            obstacle_penalty: 10,
            max_obstacle_height: MAX_OBSTACLE_HEIGHT,
            pathfinding_enabled: true,
        }
    }
}

impl GeoConfig {
    pub fn from_json(json: &str) -> Result<Self, GeoError> {
        let config: GeoConfig =
            serde_json::from_str(json).map_err(|e| GeoError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, GeoError> {
        let json = std::fs::read_to_string(path).map_err(|e| GeoError::Io(e).at_path(path))?;
        Self::from_json(&json)
    }

    pub fn tiers(&self) -> Result<Vec<BufferTierSpec>, GeoError> {
        parse_buffer_tiers(&self.buffer_tiers)
    }

    /// Path of the region file for a tile.
    pub fn region_path(&self, tile_x: i32, tile_y: i32) -> PathBuf {
        self.geodata_path
            .join(region_file_name(&self.file_pattern, tile_x, tile_y))
    }

    fn validate(&self) -> Result<(), GeoError> {
        self.tiers()?;
        if self.layout.region_count_x() <= 0 || self.layout.region_count_y() <= 0 {
            return Err(GeoError::Config("tile range is empty".into()));
        }
        Ok(())
    }
}
