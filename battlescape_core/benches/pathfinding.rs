// Benchmarks for tile path search and ray collision.
//
// Run with: cargo bench -p battlescape_core
//
// Maps are built from the public catalog parts: a floored level with a
// serpentine of impassable blocks, so searches have to explore most of the
// level before reaching the far corner.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

use battlescape_core::config::TileMapConfig;
use battlescape_core::map_part::{MapPart, MapPartType};
use battlescape_core::passability::{MoverCapabilities, UnitTileHelper};
use battlescape_core::tilemap::TileMap;
use battlescape_core::types::{MapPartId, MapPartTypeId, ObjectId, ObjectKindSet, TileCoord, WorldPos};

fn serpentine_map(size: i32) -> TileMap {
    let mut map = TileMap::new(TileMapConfig::with_size(size, size, 2)).unwrap();
    let vs = map.voxel_size();
    let floor = MapPartType::floor(vs);
    let block = MapPartType::solid_block(vs);
    let mut next = 1u32;
    let mut lay = |map: &mut TileMap, ty: &MapPartType, tile: TileCoord| {
        let part = MapPart {
            id: MapPartId(next),
            object: ObjectId(next),
            part_type: MapPartTypeId(0),
            tile,
        };
        next += 1;
        map.insert(&part.placement(ty));
    };
    for y in 0..size {
        for x in 0..size {
            lay(&mut map, &floor, TileCoord::new(x, y, 0));
        }
    }
    // Walls on every fourth row, open at alternating ends.
    for row in (2..size - 1).step_by(4) {
        let gap = if (row / 4) % 2 == 0 { size - 1 } else { 0 };
        for x in (0..size).filter(|&x| x != gap) {
            lay(&mut map, &block, TileCoord::new(x, row, 0));
        }
    }
    map
}

fn bench_find_path(c: &mut Criterion) {
    let mut group = c.benchmark_group("find_path");
    for size in [16, 32, 64] {
        let map = serpentine_map(size);
        let walker = UnitTileHelper::new(MoverCapabilities::walker());
        let goal = TileCoord::new(size - 1, size - 1, 0);
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| {
                let result = map.find_path(
                    black_box(TileCoord::new(0, 0, 0)),
                    black_box(goal),
                    &walker,
                    100_000,
                );
                black_box(result.total_cost)
            });
        });
    }
    group.finish();
}

fn bench_ray_collision(c: &mut Criterion) {
    let map = serpentine_map(32);
    c.bench_function("ray_collision_diagonal", |b| {
        b.iter(|| {
            map.ray_collision(
                black_box(WorldPos::new(0.5, 0.5, 0.5)),
                black_box(WorldPos::new(31.5, 31.5, 0.5)),
                ObjectKindSet::all(),
                None,
            )
        });
    });
}

criterion_group!(benches, bench_find_path, bench_ray_collision);
criterion_main!(benches);
