//! Single unconstrained walker carving until a fixed coverage target.

use crate::error::GenError;
use crate::geometry::CARDINALS;
use crate::map::{Map, Tile};
use crate::request::{AlgorithmParams, GenerateRequest};
use crate::rng::Rng;

pub fn generate(request: &GenerateRequest, map: &mut Map, rng: &mut Rng) -> Result<(), GenError> {
    let AlgorithmParams::DrunkardsWalk(config) = &request.params else {
        return Err(GenError::InvalidArgument("drunkard's walk generator needs its own params"));
    };

    map.fill(Tile::Wall);
    map.clear_metadata();

    let total_cells = map.tile_count() as u64;
    // Base coverage is fixed for the minimal algorithm surface.
    let target_floor_tiles = ((total_cells * 33) / 100).max(16);
    let max_steps = (total_cells * 24).max(target_floor_tiles);

    let mut x = rng.range(0, map.width() - 1);
    let mut y = rng.range(0, map.height() - 1);
    let mut dir_index = rng.range(0, 3) as usize;

    let mut carved: u64 = 0;
    if map.get_tile(x, y) != Tile::Floor {
        map.set_tile(x, y, Tile::Floor);
        carved += 1;
    }

    let mut steps: u64 = 0;
    while steps < max_steps && carved < target_floor_tiles {
        steps += 1;

        if rng.range(0, 99) < config.wiggle_percent {
            dir_index = rng.range(0, 3) as usize;
        }

        let nx = x + CARDINALS[dir_index].0;
        let ny = y + CARDINALS[dir_index].1;
        if !map.in_bounds(nx, ny) {
            dir_index = rng.range(0, 3) as usize;
            continue;
        }

        x = nx;
        y = ny;
        if map.get_tile(x, y) != Tile::Floor {
            map.set_tile(x, y, Tile::Floor);
            carved += 1;
        }
    }

    if carved == 0 {
        return Err(GenError::GenerationFailed("walker carved nothing"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::Algorithm;

    #[test]
    fn test_hits_the_coverage_floor() {
        let req = GenerateRequest::new(Algorithm::DrunkardsWalk, 30, 30, 11);
        let mut map = Map::new(30, 30, Tile::Wall).unwrap();
        generate(&req, &mut map, &mut Rng::new(req.seed)).unwrap();
        let target = (30u64 * 30 * 33 / 100).max(16);
        assert!(map.count_walkable() >= target);
    }

    #[test]
    fn test_minimum_sixteen_tiles_on_tiny_maps() {
        let req = GenerateRequest::new(Algorithm::DrunkardsWalk, 6, 6, 3);
        let mut map = Map::new(6, 6, Tile::Wall).unwrap();
        generate(&req, &mut map, &mut Rng::new(req.seed)).unwrap();
        assert!(map.count_walkable() >= 16);
    }

    #[test]
    fn test_deterministic() {
        let req = GenerateRequest::new(Algorithm::DrunkardsWalk, 25, 18, 808);
        let mut a = Map::new(25, 18, Tile::Wall).unwrap();
        let mut b = Map::new(25, 18, Tile::Wall).unwrap();
        generate(&req, &mut a, &mut Rng::new(req.seed)).unwrap();
        generate(&req, &mut b, &mut Rng::new(req.seed)).unwrap();
        assert_eq!(a.tiles(), b.tiles());
    }
}
