// The geodata facade: world-wide height and passability lookups.
//
// `GeoData` owns one optional `Region` per tile of the configured
// `WorldLayout`, stored x-major in a flat `Vec`. Every lookup takes geo
// coordinates, finds the owning region and block, and delegates to `Block`.
// Coordinates that fall outside the loaded grid, or inside a tile whose file
// was missing, answer as a `Null` block: height echoes the query and every
// direction is open.
//
// Loading reads all region files in parallel with rayon. A missing file is
// not an error (the tile simply has no data), but a file that exists and
// fails to parse aborts the whole load; a half-loaded world would make
// movement checks silently wrong.
//
// See also: `block.rs` for per-variant semantics, `config.rs` for the layout
// and file naming, `check.rs` and `pathfinding.rs` which are the main
// consumers.
//
// **Critical constraint: read-only after construction.** `GeoData` is shared
// behind an `Arc` by every checker and pathfinder thread. There are no
// interior-mutable fields; building and inserting regions takes `&mut self`
// and happens before the first `Arc::new`.

use rayon::prelude::*;

use crate::block::Block;
use crate::config::{GeoConfig, WorldLayout};
use crate::consts::{BLOCK_CELLS_X, BLOCK_CELLS_Y, REGION_CELLS_X, REGION_CELLS_Y};
use crate::error::GeoError;
use crate::nswe::Nswe;
use crate::region::{BlockCounts, Region};
use crate::types::{GeoPos, Location};

static NULL_BLOCK: Block = Block::Null;

#[derive(Clone, Debug)]
pub struct GeoData {
    layout: WorldLayout,
    /// Indexed by `region_slot`; `None` for tiles without data.
    regions: Vec<Option<Region>>,
}

impl GeoData {
    /// A world with no regions loaded. Every lookup answers as `Null`.
    pub fn empty(layout: WorldLayout) -> Self {
        let count = (layout.region_count_x() * layout.region_count_y()).max(0) as usize;
        Self {
            layout,
            regions: vec![None; count],
        }
    }

    /// Build from in-memory regions keyed by tile coordinates.
    pub fn from_regions(
        layout: WorldLayout,
        regions: impl IntoIterator<Item = ((i32, i32), Region)>,
    ) -> Result<Self, GeoError> {
        let mut geo = Self::empty(layout);
        for ((tile_x, tile_y), region) in regions {
            geo.insert_region(tile_x, tile_y, region)?;
        }
        Ok(geo)
    }

    /// Load every tile named by `config.layout` from `config.geodata_path`.
    pub fn load(config: &GeoConfig) -> Result<Self, GeoError> {
        let layout = config.layout;
        let tiles: Vec<(i32, i32)> = layout.tiles().collect();
        let loaded = tiles
            .into_par_iter()
            .map(|(tile_x, tile_y)| -> Result<Option<((i32, i32), Region)>, GeoError> {
                let path = config.region_path(tile_x, tile_y);
                if !path.is_file() {
                    tracing::warn!(path = %path.display(), tile_x, tile_y, "region file missing, tile left without geodata");
                    return Ok(None);
                }
                let region = Region::load(&path)?;
                tracing::debug!(path = %path.display(), "region loaded");
                Ok(Some(((tile_x, tile_y), region)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let geo = Self::from_regions(layout, loaded.into_iter().flatten())?;
        let counts = geo.block_counts();
        tracing::info!(
            regions = geo.region_count(),
            tiles = geo.regions.len(),
            null = counts.null,
            flat = counts.flat,
            complex = counts.complex,
            multilayer = counts.multilayer,
            "geodata loaded"
        );
        Ok(geo)
    }

    /// Place a region at a tile, replacing whatever was there.
    pub fn insert_region(&mut self, tile_x: i32, tile_y: i32, region: Region) -> Result<(), GeoError> {
        let rx = tile_x - self.layout.tile_x_min;
        let ry = tile_y - self.layout.tile_y_min;
        let slot = self.region_slot(rx, ry).ok_or_else(|| {
            GeoError::Config(format!("tile {tile_x}_{tile_y} is outside the configured layout"))
        })?;
        self.regions[slot] = Some(region);
        Ok(())
    }

    pub fn layout(&self) -> &WorldLayout {
        &self.layout
    }

    /// Number of tiles with data.
    pub fn region_count(&self) -> usize {
        self.regions.iter().filter(|r| r.is_some()).count()
    }

    pub fn block_counts(&self) -> BlockCounts {
        let mut counts = BlockCounts::default();
        for region in self.regions.iter().flatten() {
            counts += region.counts();
        }
        counts
    }

    // -----------------------------------------------------------------------
    // Dispatch
    // -----------------------------------------------------------------------

    fn region_slot(&self, rx: i32, ry: i32) -> Option<usize> {
        let (count_x, count_y) = (self.layout.region_count_x(), self.layout.region_count_y());
        if rx < 0 || ry < 0 || rx >= count_x || ry >= count_y {
            return None;
        }
        Some((rx * count_y + ry) as usize)
    }

    /// Block owning a geo cell, or a shared `Null` block outside the data.
    fn block(&self, geo_x: i32, geo_y: i32) -> &Block {
        if geo_x < 0 || geo_y < 0 {
            return &NULL_BLOCK;
        }
        let Some(slot) = self.region_slot(geo_x / REGION_CELLS_X, geo_y / REGION_CELLS_Y) else {
            return &NULL_BLOCK;
        };
        match &self.regions[slot] {
            Some(region) => region.block(
                (geo_x % REGION_CELLS_X) / BLOCK_CELLS_X,
                (geo_y % REGION_CELLS_Y) / BLOCK_CELLS_Y,
            ),
            None => &NULL_BLOCK,
        }
    }

    // -----------------------------------------------------------------------
    // Lookups
    // -----------------------------------------------------------------------

    pub fn has_geo_pos(&self, geo_x: i32, geo_y: i32) -> bool {
        self.block(geo_x, geo_y).has_geo_pos()
    }

    pub fn height_nearest(&self, geo_x: i32, geo_y: i32, z: i32) -> i32 {
        self.block(geo_x, geo_y).height_nearest(geo_x, geo_y, z)
    }

    pub fn height_above(&self, geo_x: i32, geo_y: i32, z: i32) -> Result<i32, GeoError> {
        self.block(geo_x, geo_y).height_above(geo_x, geo_y, z)
    }

    pub fn height_below(&self, geo_x: i32, geo_y: i32, z: i32) -> Result<i32, GeoError> {
        self.block(geo_x, geo_y).height_below(geo_x, geo_y, z)
    }

    pub fn nswe_nearest(&self, geo_x: i32, geo_y: i32, z: i32) -> Nswe {
        self.block(geo_x, geo_y).nswe_nearest(geo_x, geo_y, z)
    }

    /// Flags of the closest layer strictly below `z`; `NONE` if there is none.
    pub fn nswe_below(&self, geo_x: i32, geo_y: i32, z: i32) -> Nswe {
        self.block(geo_x, geo_y)
            .nswe_below(geo_x, geo_y, z)
            .unwrap_or(Nswe::NONE)
    }

    // -----------------------------------------------------------------------
    // Coordinate conversion
    // -----------------------------------------------------------------------

    pub fn geo_x(&self, world_x: i32) -> i32 {
        self.layout.geo_x(world_x)
    }

    pub fn geo_y(&self, world_y: i32) -> i32 {
        self.layout.geo_y(world_y)
    }

    pub fn world_x(&self, geo_x: i32) -> i32 {
        self.layout.world_x(geo_x)
    }

    pub fn world_y(&self, geo_y: i32) -> i32 {
        self.layout.world_y(geo_y)
    }

    /// Cell of a world location, snapped to the layer nearest its height.
    pub fn geo_pos(&self, loc: Location) -> GeoPos {
        let (x, y) = (self.geo_x(loc.x), self.geo_y(loc.y));
        GeoPos::new(x, y, self.height_nearest(x, y, loc.z))
    }

    /// Centre of a cell in world space at the position's layer height.
    pub fn location(&self, pos: GeoPos) -> Location {
        Location::new(self.world_x(pos.x), self.world_y(pos.y), pos.z)
    }
}
