//! Classic cave automaton: random seed, wall-majority simulation steps,
//! largest-component retention.

use crate::connectivity::enforce_single_connected_region;
use crate::error::GenError;
use crate::map::{Map, Tile};
use crate::request::{AlgorithmParams, GenerateRequest};
use crate::rng::Rng;

fn count_neighbor_walls(map: &Map, x: i32, y: i32) -> i32 {
    let mut walls = 0;
    for ny in y - 1..=y + 1 {
        for nx in x - 1..=x + 1 {
            if nx == x && ny == y {
                continue;
            }
            // Out of bounds counts as wall.
            if !map.in_bounds(nx, ny) || map.get_tile(nx, ny) == Tile::Wall {
                walls += 1;
            }
        }
    }
    walls
}

pub fn generate(request: &GenerateRequest, map: &mut Map, rng: &mut Rng) -> Result<(), GenError> {
    let AlgorithmParams::CellularAutomata(config) = &request.params else {
        return Err(GenError::InvalidArgument("cellular automata generator needs its own params"));
    };

    map.fill(Tile::Wall);
    map.clear_metadata();

    for y in 1..map.height() - 1 {
        for x in 1..map.width() - 1 {
            if rng.range(0, 99) >= config.initial_wall_percent {
                map.set_tile(x, y, Tile::Floor);
            }
        }
    }

    let width = map.width();
    let height = map.height();
    for _ in 0..config.simulation_steps {
        let mut scratch = map.tiles().to_vec();
        for y in 0..height {
            for x in 0..width {
                let index = map.tile_index(x, y);
                if x == 0 || y == 0 || x == width - 1 || y == height - 1 {
                    scratch[index] = Tile::Wall;
                    continue;
                }
                scratch[index] = if count_neighbor_walls(map, x, y) >= config.wall_threshold {
                    Tile::Wall
                } else {
                    Tile::Floor
                };
            }
        }
        map.replace_tiles(width, height, scratch);
    }

    if map.count_walkable() == 0 {
        let cx = map.width() / 2;
        let cy = map.height() / 2;
        map.set_tile(cx, cy, Tile::Floor);
    }

    enforce_single_connected_region(map);

    if map.count_walkable() == 0 {
        return Err(GenError::GenerationFailed("automaton collapsed to walls"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectivity::analyze_top_down_connectivity;
    use crate::request::{Algorithm, CellularAutomataConfig};

    #[test]
    fn test_single_component_after_retention() {
        let req = GenerateRequest::new(Algorithm::CellularAutomata, 40, 30, 5);
        let mut map = Map::new(40, 30, Tile::Wall).unwrap();
        generate(&req, &mut map, &mut Rng::new(req.seed)).unwrap();
        let stats = analyze_top_down_connectivity(&map);
        assert_eq!(stats.component_count, 1);
    }

    #[test]
    fn test_total_collapse_restores_center_tile() {
        let mut req = GenerateRequest::new(Algorithm::CellularAutomata, 16, 16, 5);
        req.params = AlgorithmParams::CellularAutomata(CellularAutomataConfig {
            initial_wall_percent: 100,
            simulation_steps: 1,
            wall_threshold: 0,
        });
        let mut map = Map::new(16, 16, Tile::Wall).unwrap();
        generate(&req, &mut map, &mut Rng::new(req.seed)).unwrap();
        assert_eq!(map.count_walkable(), 1);
        assert_eq!(map.get_tile(8, 8), Tile::Floor);
    }

    #[test]
    fn test_border_stays_walled() {
        let req = GenerateRequest::new(Algorithm::CellularAutomata, 24, 24, 77);
        let mut map = Map::new(24, 24, Tile::Wall).unwrap();
        generate(&req, &mut map, &mut Rng::new(req.seed)).unwrap();
        for x in 0..24 {
            assert_eq!(map.get_tile(x, 0), Tile::Wall);
            assert_eq!(map.get_tile(x, 23), Tile::Wall);
        }
    }
}
