// Diagonal NSWE derivation.
//
// Surveyed data only says whether each cell can be left north, south, west
// or east. The runtime's `Diagonal` move rules want a direct answer for the
// four diagonals too, so the converter bakes one in: a diagonal is open if
// either corner route around it is open. For north-west:
//
//   NW = (own N and north neighbour's W) or (own W and west neighbour's N)
//
// and symmetrically for NE, SW and SE.
//
// Neighbour flags are read on the layer just below the current layer's
// height plus `CELL_IGNORE_HEIGHT`, i.e. the floor a character standing here
// would step onto. A neighbour outside the region counts as unsurveyed
// (all open); a neighbour with no layer in reach counts as closed.
//
// Derivation reads only cardinal flags and writes only diagonal ones, so
// blocks can be updated one at a time in any order.
//
// See also: `geodata_core::check::step_allowed`, whose `Cardinal` rule is
// this same formula evaluated at query time.

use geodata_core::block::{Block, cell_index};
use geodata_core::consts::{
    BLOCK_CELLS_X, BLOCK_CELLS_Y, CELL_IGNORE_HEIGHT, REGION_BLOCKS_X, REGION_BLOCKS_Y,
    REGION_CELLS_X, REGION_CELLS_Y,
};
use geodata_core::nswe::Nswe;
use geodata_core::region::Region;

/// Flags of the layer below `z` in a region-local cell, with out-of-region
/// cells answering as unsurveyed.
fn neighbour_nswe(region: &Region, cell_x: i32, cell_y: i32, z: i32) -> Nswe {
    if cell_x < 0 || cell_y < 0 || cell_x >= REGION_CELLS_X || cell_y >= REGION_CELLS_Y {
        return Nswe::ALL;
    }
    region
        .block_at_cell(cell_x, cell_y)
        .nswe_below(cell_x, cell_y, z)
        .unwrap_or(Nswe::NONE)
}

/// Cardinal flags of a layer at height `z` in cell `(cell_x, cell_y)`,
/// combined with derived diagonal flags. Existing diagonal bits in `nswe`
/// are discarded.
pub fn update_nswe_below(region: &Region, cell_x: i32, cell_y: i32, z: i32, nswe: Nswe) -> Nswe {
    let z = z + CELL_IGNORE_HEIGHT;
    let north = neighbour_nswe(region, cell_x, cell_y - 1, z);
    let south = neighbour_nswe(region, cell_x, cell_y + 1, z);
    let west = neighbour_nswe(region, cell_x - 1, cell_y, z);
    let east = neighbour_nswe(region, cell_x + 1, cell_y, z);

    let has = |flag| nswe.contains(flag);
    let mut result = nswe.cardinal();
    let rules = [
        (Nswe::NW, Nswe::N, north, Nswe::W, Nswe::W, west, Nswe::N),
        (Nswe::NE, Nswe::N, north, Nswe::E, Nswe::E, east, Nswe::N),
        (Nswe::SW, Nswe::S, south, Nswe::W, Nswe::W, west, Nswe::S),
        (Nswe::SE, Nswe::S, south, Nswe::E, Nswe::E, east, Nswe::S),
    ];
    for (diagonal, first, first_cell, first_then, second, second_cell, second_then) in rules {
        if (has(first) && first_cell.contains(first_then)) || (has(second) && second_cell.contains(second_then)) {
            result |= diagonal;
        }
    }
    result
}

/// Derive diagonal flags for every complex cell and every multilayer layer
/// in the region. Flat and null blocks have no stored flags and are left
/// alone. Returns the number of layers whose flags changed.
pub fn derive_diagonals(region: &mut Region) -> usize {
    let mut changed = 0;
    let mut updates = Vec::new();
    for block_x in 0..REGION_BLOCKS_X {
        for block_y in 0..REGION_BLOCKS_Y {
            let block = region.block(block_x, block_y);
            if !matches!(block, Block::Complex(_) | Block::Multilayer(_)) {
                continue;
            }
            for cx in 0..BLOCK_CELLS_X {
                for cy in 0..BLOCK_CELLS_Y {
                    let (cell_x, cell_y) = (block_x * BLOCK_CELLS_X + cx, block_y * BLOCK_CELLS_Y + cy);
                    let index = cell_index(cell_x, cell_y);
                    for (layer_index, layer) in block.cell_layers(index).iter().enumerate() {
                        let nswe = update_nswe_below(region, cell_x, cell_y, i32::from(layer.height), layer.nswe);
                        if nswe != layer.nswe {
                            updates.push((index, layer_index, nswe));
                        }
                    }
                }
            }
            changed += updates.len();
            let block = region.block_mut(block_x, block_y);
            for (index, layer_index, nswe) in updates.drain(..) {
                block.cell_layers_mut(index)[layer_index].nswe = nswe;
            }
        }
    }
    tracing::trace!(changed, "diagonal flags derived");
    changed
}
