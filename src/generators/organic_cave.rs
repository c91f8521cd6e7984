//! Centered drunkard's walk with a disc brush and majority-rule smoothing.

use crate::connectivity::smooth_walkable_regions;
use crate::error::GenError;
use crate::geometry::carve_brush;
use crate::map::{Map, Tile};
use crate::request::{AlgorithmParams, GenerateRequest};
use crate::rng::Rng;

fn random_step(rng: &mut Rng, x: &mut i32, y: &mut i32, min_x: i32, max_x: i32, min_y: i32, max_y: i32) {
    match rng.range(0, 3) {
        0 => *x += 1,
        1 => *x -= 1,
        2 => *y += 1,
        _ => *y -= 1,
    }
    *x = (*x).clamp(min_x, max_x);
    *y = (*y).clamp(min_y, max_y);
}

pub fn generate(request: &GenerateRequest, map: &mut Map, rng: &mut Rng) -> Result<(), GenError> {
    let AlgorithmParams::OrganicCave(config) = &request.params else {
        return Err(GenError::InvalidArgument("organic cave generator needs its own params"));
    };

    map.fill(Tile::Wall);
    map.clear_metadata();

    let walk_steps = if config.walk_steps <= 0 {
        map.width() * map.height()
    } else {
        config.walk_steps
    };
    let brush_radius = config.brush_radius.clamp(0, 6);
    let smoothing_passes = config.smoothing_passes.clamp(0, 8);
    let target_floor_coverage = config.target_floor_coverage.clamp(0.0, 0.9);

    let mut x = map.width() / 2;
    let mut y = map.height() / 2;

    for _ in 0..walk_steps {
        carve_brush(map, x, y, brush_radius, Tile::Floor);
        random_step(rng, &mut x, &mut y, 1, map.width() - 2, 1, map.height() - 2);
        // Occasional teleport keeps the cave from collapsing into one blob.
        if rng.next_u32() % 19 == 0 {
            x = rng.range(1, map.width() - 2);
            y = rng.range(1, map.height() - 2);
        }
    }

    if target_floor_coverage > 0.0 {
        let total_cells = map.tile_count() as u64;
        let target_walkable = (total_cells as f32 * target_floor_coverage) as u64;
        let mut current_walkable = map.count_walkable();
        let mut safety_steps = map.width() * map.height() * 10;

        while current_walkable < target_walkable && safety_steps > 0 {
            carve_brush(map, x, y, brush_radius, Tile::Floor);
            random_step(rng, &mut x, &mut y, 1, map.width() - 2, 1, map.height() - 2);
            current_walkable = map.count_walkable();
            safety_steps -= 1;
        }
    }

    smooth_walkable_regions(map, smoothing_passes);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{Algorithm, OrganicCaveConfig};

    #[test]
    fn test_reaches_target_coverage() {
        let mut req = GenerateRequest::new(Algorithm::OrganicCave, 32, 16, 42);
        req.params = AlgorithmParams::OrganicCave(OrganicCaveConfig {
            target_floor_coverage: 0.30,
            smoothing_passes: 0,
            ..Default::default()
        });
        let mut map = Map::new(32, 16, Tile::Wall).unwrap();
        generate(&req, &mut map, &mut Rng::new(req.seed)).unwrap();
        let coverage = map.count_walkable() as f32 / map.tile_count() as f32;
        assert!(coverage >= 0.29, "coverage {coverage}");
    }

    #[test]
    fn test_carves_around_the_center() {
        let req = GenerateRequest::new(Algorithm::OrganicCave, 24, 24, 7);
        let mut map = Map::new(24, 24, Tile::Wall).unwrap();
        generate(&req, &mut map, &mut Rng::new(req.seed)).unwrap();
        assert!(map.count_walkable() > 0);
    }

    #[test]
    fn test_deterministic() {
        let req = GenerateRequest::new(Algorithm::OrganicCave, 20, 20, 12345);
        let mut a = Map::new(20, 20, Tile::Wall).unwrap();
        let mut b = Map::new(20, 20, Tile::Wall).unwrap();
        generate(&req, &mut a, &mut Rng::new(req.seed)).unwrap();
        generate(&req, &mut b, &mut Rng::new(req.seed)).unwrap();
        assert_eq!(a.tiles(), b.tiles());
    }
}
