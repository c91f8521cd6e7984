//! Criterion benchmarks for the base generation pipeline.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

use dungeon_core::generate::generate;
use dungeon_core::request::{Algorithm, GenerateRequest};

fn bench_algorithms(c: &mut Criterion) {
    let mut group = c.benchmark_group("generate_64x64");

    for algorithm in [
        Algorithm::BspTree,
        Algorithm::RoomsAndMazes,
        Algorithm::DrunkardsWalk,
        Algorithm::CellularAutomata,
        Algorithm::ValueNoise,
        Algorithm::RoomGraph,
        Algorithm::WormCaves,
        Algorithm::SimplexNoise,
        Algorithm::RoomsAndCorridors,
        Algorithm::OrganicCave,
    ] {
        let mut request = GenerateRequest::new(algorithm, 64, 64, 0xBEEF);
        request.constraints.require_connected_floor = false;
        request.constraints.max_generation_attempts = 4;

        group.bench_with_input(
            BenchmarkId::from_parameter(algorithm.name()),
            &request,
            |b, request| b.iter(|| generate(request).unwrap()),
        );
    }

    group.finish();
}

fn bench_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("generate_cellular_by_size");
    for size in [32, 64, 128] {
        let mut request = GenerateRequest::new(Algorithm::CellularAutomata, size, size, 7);
        request.constraints.require_connected_floor = false;
        request.constraints.max_generation_attempts = 4;
        group.bench_with_input(BenchmarkId::from_parameter(size), &request, |b, request| {
            b.iter(|| generate(request).unwrap())
        });
    }
    group.finish();
}

criterion_group!(benches, bench_algorithms, bench_scaling);
criterion_main!(benches);
