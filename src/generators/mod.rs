//! Base map generators.
//!
//! Each generator is a pure function `(request, map, rng) -> Result` over a
//! pre-initialized map. Every implementation starts by refilling the grid
//! with WALL and clearing metadata, then carves. Room-like generators also
//! populate room/corridor metadata. Iteration is row-major and candidate
//! selections draw `rng.range(0, count - 1)`; both are part of the
//! reproducibility contract.

pub mod bsp;
pub mod cellular_automata;
pub mod drunkards_walk;
pub mod organic_cave;
pub mod room_graph;
pub mod rooms_and_mazes;
pub mod rooms_corridors;
pub mod simplex_noise;
pub mod value_noise;
pub mod worm_caves;

use crate::error::GenError;
use crate::geometry::Rect;
use crate::map::Map;
use crate::request::{Algorithm, GenerateRequest, GenerationConstraints};
use crate::rng::Rng;

/// Dispatch on the request's algorithm tag.
pub fn run_base_generator(
    request: &GenerateRequest,
    map: &mut Map,
    rng: &mut Rng,
) -> Result<(), GenError> {
    match request.algorithm() {
        Algorithm::BspTree => bsp::generate(request, map, rng),
        Algorithm::RoomsAndMazes => rooms_and_mazes::generate(request, map, rng),
        Algorithm::DrunkardsWalk => drunkards_walk::generate(request, map, rng),
        Algorithm::CellularAutomata => cellular_automata::generate(request, map, rng),
        Algorithm::ValueNoise => value_noise::generate(request, map, rng),
        Algorithm::RoomGraph => room_graph::generate(request, map, rng),
        Algorithm::WormCaves => worm_caves::generate(request, map, rng),
        Algorithm::SimplexNoise => simplex_noise::generate(request, map, rng),
        Algorithm::RoomsAndCorridors => rooms_corridors::generate(request, map, rng),
        Algorithm::OrganicCave => organic_cave::generate(request, map, rng),
    }
}

pub(crate) fn room_overlaps_forbidden(constraints: &GenerationConstraints, room: &Rect) -> bool {
    constraints
        .forbidden_regions
        .iter()
        .any(|region| region.is_valid() && room.overlaps(region))
}

/// Placement check shared by the scatter-style room generators: inside the
/// 1-tile border, padded-overlap free against existing rooms, and clear of
/// forbidden regions.
pub(crate) fn can_place_room(
    map: &Map,
    candidate: &Rect,
    spacing: i32,
    constraints: &GenerationConstraints,
) -> bool {
    if candidate.x < 1 || candidate.y < 1 {
        return false;
    }
    if i64::from(candidate.x) + i64::from(candidate.width) > i64::from(map.width()) - 1 {
        return false;
    }
    if i64::from(candidate.y) + i64::from(candidate.height) > i64::from(map.height()) - 1 {
        return false;
    }
    if map
        .metadata
        .rooms
        .iter()
        .any(|room| candidate.overlaps_with_padding(&room.bounds, spacing))
    {
        return false;
    }
    !room_overlaps_forbidden(constraints, candidate)
}

/// Manhattan corridor length between two centers, endpoints inclusive.
pub(crate) fn l_path_length(ax: i32, ay: i32, bx: i32, by: i32) -> i32 {
    1 + (ax - bx).abs() + (ay - by).abs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::{Tile, ROOM_FLAG_NONE};
    use crate::request::GenerationConstraints;

    #[test]
    fn test_can_place_room_respects_border_and_padding() {
        let mut map = Map::new(12, 12, Tile::Wall).unwrap();
        let constraints = GenerationConstraints::default();
        assert!(can_place_room(&map, &Rect::new(1, 1, 4, 4), 1, &constraints));
        assert!(!can_place_room(&map, &Rect::new(0, 1, 4, 4), 1, &constraints));
        assert!(!can_place_room(&map, &Rect::new(8, 1, 4, 4), 1, &constraints));

        map.add_room(Rect::new(1, 1, 4, 4), ROOM_FLAG_NONE).unwrap();
        assert!(!can_place_room(&map, &Rect::new(5, 1, 4, 4), 1, &constraints));
        assert!(can_place_room(&map, &Rect::new(6, 6, 4, 4), 1, &constraints));
    }

    #[test]
    fn test_can_place_room_rejects_forbidden_overlap() {
        let map = Map::new(16, 16, Tile::Wall).unwrap();
        let mut constraints = GenerationConstraints::default();
        constraints.forbidden_regions.push(Rect::new(4, 4, 4, 4));
        assert!(!can_place_room(&map, &Rect::new(3, 3, 3, 3), 1, &constraints));
        assert!(can_place_room(&map, &Rect::new(9, 9, 3, 3), 1, &constraints));
    }

    #[test]
    fn test_l_path_length_counts_endpoints() {
        assert_eq!(l_path_length(0, 0, 0, 0), 1);
        assert_eq!(l_path_length(0, 0, 3, 4), 8);
    }
}
