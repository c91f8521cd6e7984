//! Bilinearly-interpolated lattice noise accumulated over octaves.
//!
//! The lattice values are drawn from the request RNG so the field replays
//! call-for-call; cell size halves per octave with a floor of 1.

use crate::connectivity::enforce_single_connected_region;
use crate::error::GenError;
use crate::map::{Map, Tile};
use crate::request::{AlgorithmParams, GenerateRequest};
use crate::rng::Rng;

fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

fn sample(lattice: &[f64], lattice_width: usize, gx: usize, gy: usize, fx: f64, fy: f64) -> f64 {
    let v00 = lattice[gy * lattice_width + gx];
    let v10 = lattice[gy * lattice_width + gx + 1];
    let v01 = lattice[(gy + 1) * lattice_width + gx];
    let v11 = lattice[(gy + 1) * lattice_width + gx + 1];
    lerp(lerp(v00, v10, fx), lerp(v01, v11, fx), fy)
}

pub fn generate(request: &GenerateRequest, map: &mut Map, rng: &mut Rng) -> Result<(), GenError> {
    let AlgorithmParams::ValueNoise(config) = &request.params else {
        return Err(GenError::InvalidArgument("value noise generator needs its own params"));
    };

    map.fill(Tile::Wall);
    map.clear_metadata();

    let cell_count = map.tile_count();
    let mut accum = vec![0.0f64; cell_count];
    let mut total_amplitude = 0.0f64;
    let mut amplitude = 1.0f64;
    let persistence = f64::from(config.persistence_percent) / 100.0;

    for octave in 0..config.octaves {
        let cell_size = (config.feature_size >> octave).max(1);
        let lattice_width = (map.width() / cell_size + 3) as usize;
        let lattice_height = (map.height() / cell_size + 3) as usize;

        let mut lattice = vec![0.0f64; lattice_width * lattice_height];
        for value in lattice.iter_mut() {
            *value = f64::from(rng.next_u32()) / f64::from(u32::MAX);
        }

        for y in 0..map.height() {
            for x in 0..map.width() {
                let gx = (x / cell_size) as usize;
                let gy = (y / cell_size) as usize;
                let fx = f64::from(x % cell_size) / f64::from(cell_size);
                let fy = f64::from(y % cell_size) / f64::from(cell_size);
                accum[map.tile_index(x, y)] += sample(&lattice, lattice_width, gx, gy, fx, fy) * amplitude;
            }
        }

        total_amplitude += amplitude;
        amplitude *= persistence;
    }

    if total_amplitude <= 0.0 {
        total_amplitude = 1.0;
    }

    let threshold = f64::from(config.floor_threshold_percent) / 100.0;
    for y in 0..map.height() {
        for x in 0..map.width() {
            let index = map.tile_index(x, y);
            if accum[index] / total_amplitude >= threshold {
                map.set_tile(x, y, Tile::Floor);
            }
        }
    }

    if map.count_walkable() == 0 {
        let cx = map.width() / 2;
        let cy = map.height() / 2;
        map.set_tile(cx, cy, Tile::Floor);
    }

    enforce_single_connected_region(map);

    if map.count_walkable() == 0 {
        return Err(GenError::GenerationFailed("noise field produced no floor"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectivity::analyze_top_down_connectivity;
    use crate::request::{Algorithm, ValueNoiseConfig};

    #[test]
    fn test_threshold_extremes() {
        let mut req = GenerateRequest::new(Algorithm::ValueNoise, 24, 24, 9);
        req.params = AlgorithmParams::ValueNoise(ValueNoiseConfig {
            floor_threshold_percent: 0,
            ..Default::default()
        });
        let mut map = Map::new(24, 24, Tile::Wall).unwrap();
        generate(&req, &mut map, &mut Rng::new(req.seed)).unwrap();
        // Threshold 0 floors everything.
        assert_eq!(map.count_walkable(), 24 * 24);

        req.params = AlgorithmParams::ValueNoise(ValueNoiseConfig {
            floor_threshold_percent: 100,
            ..Default::default()
        });
        let mut map = Map::new(24, 24, Tile::Wall).unwrap();
        generate(&req, &mut map, &mut Rng::new(req.seed)).unwrap();
        // Threshold 1.0 collapses; the center fallback keeps one tile.
        assert_eq!(map.count_walkable(), 1);
    }

    #[test]
    fn test_connected_after_retention() {
        let req = GenerateRequest::new(Algorithm::ValueNoise, 48, 32, 21);
        let mut map = Map::new(48, 32, Tile::Wall).unwrap();
        generate(&req, &mut map, &mut Rng::new(req.seed)).unwrap();
        assert_eq!(analyze_top_down_connectivity(&map).component_count, 1);
    }

    #[test]
    fn test_deterministic() {
        let req = GenerateRequest::new(Algorithm::ValueNoise, 32, 32, 4242);
        let mut a = Map::new(32, 32, Tile::Wall).unwrap();
        let mut b = Map::new(32, 32, Tile::Wall).unwrap();
        generate(&req, &mut a, &mut Rng::new(req.seed)).unwrap();
        generate(&req, &mut b, &mut Rng::new(req.seed)).unwrap();
        assert_eq!(a.tiles(), b.tiles());
    }
}
