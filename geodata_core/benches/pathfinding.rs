// Criterion benchmarks for path queries and straight-line checks.
//
// Terrain is one synthetic region: flat ground with a comb of walls, each
// with a single gap, so searches have to wind back and forth.

use std::hint::black_box;
use std::sync::Arc;

use criterion::{Criterion, criterion_group, criterion_main};
use geodata_core::block::Layer;
use geodata_core::config::{GeoConfig, WorldLayout};
use geodata_core::geo::GeoData;
use geodata_core::nswe::Nswe;
use geodata_core::region::Region;
use geodata_core::types::Location;
use geodata_core::GeoEngine;

fn comb_engine() -> GeoEngine {
    let mut region = Region::flat(0);
    let no_east = Nswe(Nswe::ALL.bits() & !(Nswe::E | Nswe::NE | Nswe::SE).bits());
    let no_west = Nswe(Nswe::ALL.bits() & !(Nswe::W | Nswe::NW | Nswe::SW).bits());
    for (i, x) in (20..200).step_by(20).enumerate() {
        let gap = if i % 2 == 0 { 190 } else { 10 };
        for y in 0..200 {
            if y != gap {
                region.set_complex_cell(x, y, Layer::new(0, no_east));
                region.set_complex_cell(x + 1, y, Layer::new(0, no_west));
            }
        }
    }
    let config = GeoConfig {
        layout: WorldLayout::origin_grid(1, 1),
        max_iterations: 50_000,
        ..GeoConfig::default()
    };
    let geo = GeoData::from_regions(config.layout, [((0, 0), region)]).unwrap();
    GeoEngine::with_data(Arc::new(geo), config).unwrap()
}

fn loc(gx: i32, gy: i32) -> Location {
    Location::new(gx * 16 + 8, gy * 16 + 8, 0)
}

fn bench_find_path(c: &mut Criterion) {
    let engine = comb_engine();

    c.bench_function("find_path_open_ground", |b| {
        b.iter(|| black_box(engine.find_path(black_box(loc(5, 300)), black_box(loc(150, 400)), false)))
    });

    c.bench_function("find_path_comb", |b| {
        b.iter(|| black_box(engine.find_path(black_box(loc(5, 100)), black_box(loc(75, 100)), false)))
    });
}

fn bench_checks(c: &mut Criterion) {
    let engine = comb_engine();

    c.bench_function("can_move_to_target_loc", |b| {
        b.iter(|| black_box(engine.can_move_to_target_loc(black_box(loc(5, 100)), black_box(loc(190, 120)))))
    });

    c.bench_function("can_see_target", |b| {
        b.iter(|| black_box(engine.can_see_target(black_box(loc(5, 300)), 40, black_box(loc(190, 320)), 40)))
    });
}

criterion_group!(benches, bench_find_path, bench_checks);
criterion_main!(benches);
