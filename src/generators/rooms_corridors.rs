//! Scattered rooms joined by L-shaped corridors between centers.

use crate::error::GenError;
use crate::generators::{can_place_room, l_path_length};
use crate::geometry::{carve_l_path, carve_rect, Rect};
use crate::map::{Map, Tile, ROOM_FLAG_NONE};
use crate::request::{AlgorithmParams, CorridorRouting, GenerateRequest};
use crate::rng::Rng;

fn route_horizontal_first(rng: &mut Rng, routing: CorridorRouting) -> bool {
    match routing {
        CorridorRouting::HorizontalFirst => true,
        CorridorRouting::VerticalFirst => false,
        CorridorRouting::Random => rng.coin_flip(),
    }
}

pub fn generate(request: &GenerateRequest, map: &mut Map, rng: &mut Rng) -> Result<(), GenError> {
    let AlgorithmParams::RoomsAndCorridors(config) = &request.params else {
        return Err(GenError::InvalidArgument("rooms+corridors generator needs its own params"));
    };

    map.fill(Tile::Wall);
    map.clear_metadata();

    let min_rooms = config.min_rooms.max(1);
    let max_rooms = config.max_rooms.max(min_rooms);
    let room_min_size = config.room_min_size.max(3);
    let mut room_max_size = config.room_max_size.max(room_min_size);
    let max_attempts = config.max_placement_attempts.max(max_rooms * 8);
    let corridor_width = config.corridor_width.clamp(1, 9);
    let max_room_extent = (map.width() - 2).min(map.height() - 2);

    if max_room_extent < room_min_size {
        return Err(GenError::GenerationFailed("map too small for the minimum room size"));
    }
    room_max_size = room_max_size.clamp(room_min_size, max_room_extent);

    let target_rooms = rng.range(min_rooms, max_rooms);

    let mut attempt = 0;
    while attempt < max_attempts && (map.metadata.rooms.len() as i32) < target_rooms {
        attempt += 1;

        let width = rng.range(room_min_size, room_max_size);
        let height = rng.range(room_min_size, room_max_size);
        let max_x = map.width() - width - 1;
        let max_y = map.height() - height - 1;
        if max_x < 1 || max_y < 1 {
            continue;
        }

        let candidate = Rect::new(rng.range(1, max_x), rng.range(1, max_y), width, height);
        if !can_place_room(map, &candidate, 1, &request.constraints) {
            continue;
        }

        carve_rect(map, &candidate);
        map.add_room(candidate, ROOM_FLAG_NONE)?;
    }

    if map.metadata.rooms.is_empty() {
        return Err(GenError::GenerationFailed("no rooms placed"));
    }

    for i in 1..map.metadata.rooms.len() {
        let a = map.metadata.rooms[i - 1].bounds.center();
        let b = map.metadata.rooms[i].bounds.center();
        let horizontal_first = route_horizontal_first(rng, config.corridor_routing);
        carve_l_path(map, a, b, corridor_width, horizontal_first);

        let length = l_path_length(a.x, a.y, b.x, b.y);
        let from = map.metadata.rooms[i - 1].id;
        let to = map.metadata.rooms[i].id;
        map.add_corridor(from, to, corridor_width, length)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::Algorithm;

    fn request(seed: u64) -> GenerateRequest {
        GenerateRequest::new(Algorithm::RoomsAndCorridors, 24, 24, seed)
    }

    #[test]
    fn test_produces_rooms_and_chain_corridors() {
        let req = request(1337);
        let mut map = Map::new(req.width, req.height, Tile::Wall).unwrap();
        let mut rng = Rng::new(req.seed);
        generate(&req, &mut map, &mut rng).unwrap();

        let rooms = map.metadata.rooms.len();
        assert!((6..=12).contains(&rooms));
        assert_eq!(map.metadata.corridors.len(), rooms - 1);
        assert!(map.count_walkable() > 0);
    }

    #[test]
    fn test_deterministic_for_fixed_seed() {
        let req = request(99);
        let mut a = Map::new(req.width, req.height, Tile::Wall).unwrap();
        let mut b = Map::new(req.width, req.height, Tile::Wall).unwrap();
        generate(&req, &mut a, &mut Rng::new(req.seed)).unwrap();
        generate(&req, &mut b, &mut Rng::new(req.seed)).unwrap();
        assert_eq!(a.tiles(), b.tiles());
        assert_eq!(a.metadata.rooms, b.metadata.rooms);
    }

    #[test]
    fn test_fails_when_rooms_cannot_fit() {
        let mut req = request(5);
        req.width = 6;
        req.height = 6;
        let mut map = Map::new(6, 6, Tile::Wall).unwrap();
        let mut rng = Rng::new(5);
        // room_min_size 4 cannot fit inside a 6x6 interior of 4 with padding.
        let result = generate(&req, &mut map, &mut rng);
        assert!(matches!(result, Err(GenError::GenerationFailed(_))));
    }

    #[test]
    fn test_rooms_avoid_forbidden_regions() {
        let mut req = request(7);
        req.constraints.forbidden_regions.push(Rect::new(8, 8, 8, 8));
        let mut map = Map::new(req.width, req.height, Tile::Wall).unwrap();
        let mut rng = Rng::new(req.seed);
        generate(&req, &mut map, &mut rng).unwrap();
        for room in &map.metadata.rooms {
            assert!(!room.bounds.overlaps(&Rect::new(8, 8, 8, 8)));
        }
    }
}
