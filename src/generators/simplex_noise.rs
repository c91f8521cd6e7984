//! 2D simplex noise with an RNG-shuffled permutation table, octaves at
//! geometrically doubled frequency.

use crate::connectivity::enforce_single_connected_region;
use crate::error::GenError;
use crate::map::{Map, Tile};
use crate::request::{AlgorithmParams, GenerateRequest};
use crate::rng::Rng;

const GRAD3: [(i32, i32); 12] = [
    (1, 1),
    (-1, 1),
    (1, -1),
    (-1, -1),
    (1, 0),
    (-1, 0),
    (1, 0),
    (-1, 0),
    (0, 1),
    (0, -1),
    (0, 1),
    (0, -1),
];

const F2: f64 = 0.366_025_403_784_438_646_76;
const G2: f64 = 0.211_324_865_405_187_117_75;

fn fast_floor(value: f64) -> i32 {
    let i = value as i32;
    if value < f64::from(i) {
        i - 1
    } else {
        i
    }
}

fn grad_dot(grad: (i32, i32), x: f64, y: f64) -> f64 {
    f64::from(grad.0) * x + f64::from(grad.1) * y
}

/// Fisher-Yates over [0,256) driven by the request RNG, doubled to 512.
fn build_perm_table(rng: &mut Rng) -> [u8; 512] {
    let mut p: [u8; 256] = [0; 256];
    for (i, value) in p.iter_mut().enumerate() {
        *value = i as u8;
    }
    for i in (1..256).rev() {
        let j = rng.range(0, i as i32) as usize;
        p.swap(i, j);
    }

    let mut perm = [0u8; 512];
    for (i, value) in perm.iter_mut().enumerate() {
        *value = p[i & 255];
    }
    perm
}

fn simplex_noise_2d(xin: f64, yin: f64, perm: &[u8; 512]) -> f64 {
    let s = (xin + yin) * F2;
    let i = fast_floor(xin + s);
    let j = fast_floor(yin + s);

    let t = f64::from(i + j) * G2;
    let x0 = xin - (f64::from(i) - t);
    let y0 = yin - (f64::from(j) - t);

    let (i1, j1) = if x0 > y0 { (1, 0) } else { (0, 1) };

    let x1 = x0 - f64::from(i1) + G2;
    let y1 = y0 - f64::from(j1) + G2;
    let x2 = x0 - 1.0 + 2.0 * G2;
    let y2 = y0 - 1.0 + 2.0 * G2;

    let ii = (i & 255) as usize;
    let jj = (j & 255) as usize;
    let gi0 = (perm[ii + perm[jj] as usize] % 12) as usize;
    let gi1 = (perm[ii + i1 as usize + perm[jj + j1 as usize] as usize] % 12) as usize;
    let gi2 = (perm[ii + 1 + perm[jj + 1] as usize] % 12) as usize;

    let mut total = 0.0;
    for (t, gi, x, y) in [
        (0.5 - x0 * x0 - y0 * y0, gi0, x0, y0),
        (0.5 - x1 * x1 - y1 * y1, gi1, x1, y1),
        (0.5 - x2 * x2 - y2 * y2, gi2, x2, y2),
    ] {
        if t >= 0.0 {
            let t = t * t;
            total += t * t * grad_dot(GRAD3[gi], x, y);
        }
    }
    70.0 * total
}

pub fn generate(request: &GenerateRequest, map: &mut Map, rng: &mut Rng) -> Result<(), GenError> {
    let AlgorithmParams::SimplexNoise(config) = &request.params else {
        return Err(GenError::InvalidArgument("simplex noise generator needs its own params"));
    };

    map.fill(Tile::Wall);
    map.clear_metadata();

    let perm = build_perm_table(rng);

    let cell_count = map.tile_count();
    let mut accum = vec![0.0f64; cell_count];
    let mut amplitude = 1.0f64;
    let mut total_amplitude = 0.0f64;
    let mut frequency = 1.0 / f64::from(config.feature_size);
    let persistence = f64::from(config.persistence_percent) / 100.0;

    for _ in 0..config.octaves {
        for y in 0..map.height() {
            for x in 0..map.width() {
                let sample = simplex_noise_2d(f64::from(x) * frequency, f64::from(y) * frequency, &perm);
                let normalized = ((sample + 1.0) * 0.5).clamp(0.0, 1.0);
                accum[map.tile_index(x, y)] += normalized * amplitude;
            }
        }
        total_amplitude += amplitude;
        amplitude *= persistence;
        frequency *= 2.0;
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

    if config.ensure_connected != 0 {
        enforce_single_connected_region(map);
    }

    if map.count_walkable() == 0 {
        return Err(GenError::GenerationFailed("noise field produced no floor"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectivity::analyze_top_down_connectivity;
    use crate::request::{Algorithm, SimplexNoiseConfig};

    #[test]
    fn test_perm_table_is_a_permutation() {
        let mut rng = Rng::new(5);
        let perm = build_perm_table(&mut rng);
        let mut seen = [false; 256];
        for &v in &perm[..256] {
            seen[v as usize] = true;
        }
        assert!(seen.iter().all(|&s| s));
        assert_eq!(&perm[..256], &perm[256..]);
    }

    #[test]
    fn test_connectivity_gate() {
        let mut req = GenerateRequest::new(Algorithm::SimplexNoise, 40, 28, 31);
        req.params = AlgorithmParams::SimplexNoise(SimplexNoiseConfig {
            ensure_connected: 1,
            ..Default::default()
        });
        let mut map = Map::new(40, 28, Tile::Wall).unwrap();
        generate(&req, &mut map, &mut Rng::new(req.seed)).unwrap();
        assert_eq!(analyze_top_down_connectivity(&map).component_count, 1);
    }

    #[test]
    fn test_deterministic() {
        let req = GenerateRequest::new(Algorithm::SimplexNoise, 33, 27, 606);
        let mut a = Map::new(33, 27, Tile::Wall).unwrap();
        let mut b = Map::new(33, 27, Tile::Wall).unwrap();
        generate(&req, &mut a, &mut Rng::new(req.seed)).unwrap();
        generate(&req, &mut b, &mut Rng::new(req.seed)).unwrap();
        assert_eq!(a.tiles(), b.tiles());
    }
}
