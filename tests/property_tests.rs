//! Property-based tests using proptest.
//!
//! Invariants that must hold for all inputs: valid tile alphabets, exact
//! tile counts, determinism, forbidden-region holds, and connectivity when
//! requested.

use proptest::prelude::*;

use dungeon_core::connectivity::{analyze_connectivity, Perspective};
use dungeon_core::generate::generate;
use dungeon_core::geometry::Rect;
use dungeon_core::io::{read_map, write_map};
use dungeon_core::map::Tile;
use dungeon_core::request::{Algorithm, GenerateRequest};
use dungeon_core::rng::Rng;

fn cave_algorithm() -> impl Strategy<Value = Algorithm> {
    prop_oneof![
        Just(Algorithm::DrunkardsWalk),
        Just(Algorithm::CellularAutomata),
        Just(Algorithm::ValueNoise),
        Just(Algorithm::SimplexNoise),
        Just(Algorithm::OrganicCave),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn prop_any_seed_generates_valid_tile_grid(
        seed in any::<u64>(),
        algorithm in cave_algorithm(),
        width in 16i32..40,
        height in 16i32..40,
    ) {
        let mut request = GenerateRequest::new(algorithm, width, height, seed);
        request.constraints.require_connected_floor = false;
        request.constraints.max_generation_attempts = 3;

        let map = generate(&request).unwrap();
        prop_assert_eq!(map.tile_count(), (width * height) as usize);
        prop_assert!(map.tiles().iter().all(|t| matches!(
            t,
            Tile::Void | Tile::Wall | Tile::Floor | Tile::Door
        )));
        prop_assert!(map.metadata.walkable_tile_count > 0);
    }

    #[test]
    fn prop_generation_is_deterministic(seed in any::<u64>(), algorithm in cave_algorithm()) {
        let mut request = GenerateRequest::new(algorithm, 24, 24, seed);
        request.constraints.require_connected_floor = false;
        request.constraints.max_generation_attempts = 3;

        let a = generate(&request).unwrap();
        let b = generate(&request).unwrap();
        prop_assert_eq!(a.tiles(), b.tiles());
        prop_assert_eq!(a, b);
    }

    #[test]
    fn prop_connected_floor_when_required(seed in any::<u64>()) {
        let mut request = GenerateRequest::new(Algorithm::CellularAutomata, 32, 32, seed);
        request.constraints.require_connected_floor = true;
        request.constraints.max_generation_attempts = 4;

        let map = generate(&request).unwrap();
        let stats = analyze_connectivity(&map, Perspective::TopDown, None).unwrap();
        prop_assert_eq!(stats.component_count, 1);
        prop_assert!(map.metadata.connected_floor);
    }

    #[test]
    fn prop_forbidden_regions_stay_walled(
        seed in any::<u64>(),
        rx in 4i32..20,
        ry in 4i32..20,
        rw in 2i32..8,
        rh in 2i32..8,
    ) {
        let mut request = GenerateRequest::new(Algorithm::DrunkardsWalk, 32, 32, seed);
        request.constraints.require_connected_floor = false;
        request.constraints.max_generation_attempts = 4;
        request.constraints.forbidden_regions.push(Rect::new(rx, ry, rw, rh));

        let map = generate(&request).unwrap();
        for y in ry..(ry + rh).min(32) {
            for x in rx..(rx + rw).min(32) {
                prop_assert!(!map.get_tile(x, y).is_walkable(), "walkable at ({}, {})", x, y);
            }
        }
    }

    #[test]
    fn prop_saved_bytes_are_deterministic(seed in any::<u64>()) {
        let mut request = GenerateRequest::new(Algorithm::ValueNoise, 24, 20, seed);
        request.constraints.require_connected_floor = false;
        request.constraints.max_generation_attempts = 3;

        let map = generate(&request).unwrap();
        let mut first = Vec::new();
        let mut second = Vec::new();
        write_map(&map, &mut first).unwrap();
        write_map(&map, &mut second).unwrap();
        prop_assert_eq!(&first, &second);

        let loaded = read_map(&mut std::io::Cursor::new(&first)).unwrap();
        prop_assert_eq!(map, loaded);
    }

    #[test]
    fn prop_rng_streams_replay(seed in any::<u64>()) {
        let mut a = Rng::new(seed);
        let mut b = Rng::new(seed);
        for _ in 0..64 {
            prop_assert_eq!(a.next_u32(), b.next_u32());
        }
    }

    #[test]
    fn prop_rng_range_stays_inclusive(seed in any::<u64>(), lo in -50i32..50, hi in -50i32..50) {
        let mut rng = Rng::new(seed);
        let (min, max) = if lo <= hi { (lo, hi) } else { (hi, lo) };
        for _ in 0..32 {
            let v = rng.range(lo, hi);
            prop_assert!(v >= min && v <= max);
        }
    }
}
