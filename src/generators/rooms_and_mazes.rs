//! Odd-aligned rooms, growing-tree mazes through the residual walls, random
//! connectors merged with a union-find over region ids, then dead-end
//! pruning.

use petgraph::unionfind::UnionFind;

use crate::error::GenError;
use crate::geometry::{Rect, CARDINALS};
use crate::map::{Map, Tile, ROOM_FLAG_NONE};
use crate::request::{AlgorithmParams, GenerateRequest, RoomsAndMazesConfig};
use crate::rng::Rng;

struct Connector {
    wall_x: i32,
    wall_y: i32,
    target_region: i32,
    target_room_id: i32,
}

fn interior_in_bounds(map: &Map, x: i32, y: i32) -> bool {
    x > 0 && y > 0 && x < map.width() - 1 && y < map.height() - 1
}

/// Nudges a value to odd parity inside `[min_value, max_value]`; both bounds
/// are expected to be odd already.
fn make_odd(value: i32, min_value: i32, max_value: i32) -> i32 {
    let mut v = value;
    if v % 2 == 0 {
        if v + 1 <= max_value {
            v += 1;
        } else {
            v -= 1;
        }
    }
    v.clamp(min_value, max_value)
}

/// Largest odd value not above `value`.
fn odd_floor(value: i32) -> i32 {
    if value % 2 == 0 {
        value - 1
    } else {
        value
    }
}

/// Smallest odd value not below `value`.
fn odd_ceil(value: i32) -> i32 {
    if value % 2 == 0 {
        value + 1
    } else {
        value
    }
}

fn shuffle(values: &mut [usize], rng: &mut Rng) {
    if values.len() <= 1 {
        return;
    }
    for i in (1..values.len()).rev() {
        let j = rng.range(0, i as i32) as usize;
        values.swap(i, j);
    }
}

fn place_rooms(
    config: &RoomsAndMazesConfig,
    map: &mut Map,
    rng: &mut Rng,
    regions: &mut [i32],
) -> Result<i32, GenError> {
    let min_size = odd_ceil(config.room_min_size.max(3));
    let max_room_width = odd_floor(config.room_max_size.min(map.width() - 2));
    let max_room_height = odd_floor(config.room_max_size.min(map.height() - 2));
    if max_room_width < min_size || max_room_height < min_size {
        return Err(GenError::GenerationFailed("map too small for the minimum room size"));
    }

    let target_rooms = rng.range(config.min_rooms, config.max_rooms);
    let attempt_limit = target_rooms as i64 * 128 + 256;

    let mut attempt = 0i64;
    while attempt < attempt_limit && (map.metadata.rooms.len() as i32) < target_rooms {
        attempt += 1;

        let width = make_odd(rng.range(min_size, max_room_width), min_size, max_room_width);
        let height = make_odd(rng.range(min_size, max_room_height), min_size, max_room_height);

        let max_x = odd_floor(map.width() - width - 1);
        let max_y = odd_floor(map.height() - height - 1);
        if max_x < 1 || max_y < 1 {
            continue;
        }

        let x = make_odd(rng.range(1, max_x), 1, max_x);
        let y = make_odd(rng.range(1, max_y), 1, max_y);
        let room = Rect::new(x, y, width, height);

        if map
            .metadata
            .rooms
            .iter()
            .any(|placed| placed.bounds.overlaps_with_padding(&room, 1))
        {
            continue;
        }

        let id = map.add_room(room, ROOM_FLAG_NONE)?;
        // Region ids start at 1; room region = room id + 1.
        for ry in room.y..room.y + room.height {
            for rx in room.x..room.x + room.width {
                let index = map.tile_index(rx, ry);
                map.set_tile(rx, ry, Tile::Floor);
                regions[index] = id + 1;
            }
        }
    }

    if (map.metadata.rooms.len() as i32) < config.min_rooms {
        return Err(GenError::GenerationFailed("room placement missed the minimum"));
    }

    Ok(map.metadata.rooms.len() as i32 + 1)
}

fn can_carve_step(map: &Map, regions: &[i32], x: i32, y: i32, dx: i32, dy: i32) -> bool {
    let mid = (x + dx, y + dy);
    let dst = (x + dx * 2, y + dy * 2);
    if !interior_in_bounds(map, mid.0, mid.1) || !interior_in_bounds(map, dst.0, dst.1) {
        return false;
    }
    if map.get_tile(mid.0, mid.1) != Tile::Wall || map.get_tile(dst.0, dst.1) != Tile::Wall {
        return false;
    }
    regions[map.tile_index(mid.0, mid.1)] == -1 && regions[map.tile_index(dst.0, dst.1)] == -1
}

/// Stack-based growing tree, carving every other cell. The wiggle percent
/// is the chance of re-rolling direction when the head could continue
/// straight.
fn carve_maze_region(
    map: &mut Map,
    regions: &mut [i32],
    start_x: i32,
    start_y: i32,
    region_id: i32,
    wiggle_percent: i32,
    rng: &mut Rng,
) {
    let start_index = map.tile_index(start_x, start_y);
    map.set_tile(start_x, start_y, Tile::Floor);
    regions[start_index] = region_id;

    let mut stack: Vec<(i32, i32)> = vec![(start_x, start_y)];
    let mut last_dir: Option<usize> = None;

    while let Some(&(x, y)) = stack.last() {
        let mut valid_dirs: [usize; 4] = [0; 4];
        let mut valid_count = 0;
        for (d, (dx, dy)) in CARDINALS.iter().enumerate() {
            if can_carve_step(map, regions, x, y, *dx, *dy) {
                valid_dirs[valid_count] = d;
                valid_count += 1;
            }
        }

        if valid_count == 0 {
            stack.pop();
            last_dir = None;
            continue;
        }

        let choice = match last_dir {
            Some(d) if valid_dirs[..valid_count].contains(&d) && rng.range(0, 99) >= wiggle_percent => d,
            _ => valid_dirs[rng.range(0, valid_count as i32 - 1) as usize],
        };
        last_dir = Some(choice);

        let (dx, dy) = CARDINALS[choice];
        let mid = (x + dx, y + dy);
        let dst = (x + dx * 2, y + dy * 2);

        map.set_tile(mid.0, mid.1, Tile::Floor);
        map.set_tile(dst.0, dst.1, Tile::Floor);
        regions[map.tile_index(mid.0, mid.1)] = region_id;
        regions[map.tile_index(dst.0, dst.1)] = region_id;
        stack.push(dst);
    }
}

fn generate_maze_regions(
    map: &mut Map,
    regions: &mut [i32],
    mut next_region_id: i32,
    wiggle_percent: i32,
    rng: &mut Rng,
) -> i32 {
    let mut y = 1;
    while y < map.height() - 1 {
        let mut x = 1;
        while x < map.width() - 1 {
            let index = map.tile_index(x, y);
            if map.get_tile(x, y) == Tile::Wall && regions[index] == -1 {
                carve_maze_region(map, regions, x, y, next_region_id, wiggle_percent, rng);
                next_region_id += 1;
            }
            x += 2;
        }
        y += 2;
    }
    next_region_id
}

#[allow(clippy::too_many_arguments)]
fn try_add_connector(
    map: &Map,
    regions: &[i32],
    merged: &UnionFind<usize>,
    room_id: i32,
    room_region: i32,
    room_count: i32,
    room_links: &[bool],
    boundary_x: i32,
    boundary_y: i32,
    dx: i32,
    dy: i32,
    candidates: &mut Vec<Connector>,
) {
    let wall = (boundary_x + dx, boundary_y + dy);
    let target = (boundary_x + dx * 2, boundary_y + dy * 2);
    if !interior_in_bounds(map, wall.0, wall.1) || !interior_in_bounds(map, target.0, target.1) {
        return;
    }
    if map.get_tile(wall.0, wall.1) != Tile::Wall {
        return;
    }
    if !map.get_tile(target.0, target.1).is_walkable() {
        return;
    }

    let target_region = regions[map.tile_index(target.0, target.1)];
    if target_region <= 0 || target_region == room_region {
        return;
    }
    if merged.equiv(room_region as usize, target_region as usize) {
        return;
    }

    let mut target_room_id = -1;
    if target_region <= room_count {
        target_room_id = target_region - 1;
        if target_room_id == room_id {
            return;
        }
        if room_links[(room_id * room_count + target_room_id) as usize] {
            return;
        }
    }

    candidates.push(Connector {
        wall_x: wall.0,
        wall_y: wall.1,
        target_region,
        target_room_id,
    });
}

fn connect_rooms_to_regions(
    map: &mut Map,
    regions: &mut [i32],
    next_region_id: i32,
    rng: &mut Rng,
) -> Result<(), GenError> {
    let room_count = map.metadata.rooms.len() as i32;
    if room_count == 0 {
        return Ok(());
    }
    if next_region_id <= 1 {
        return Err(GenError::GenerationFailed("no regions to connect"));
    }

    let mut merged: UnionFind<usize> = UnionFind::new(next_region_id as usize);
    let mut room_links = vec![false; (room_count * room_count) as usize];

    let mut room_order: Vec<usize> = (0..room_count as usize).collect();
    shuffle(&mut room_order, rng);

    for &room_index in &room_order {
        let room_id = room_index as i32;
        let bounds = map.metadata.rooms[room_index].bounds;
        let room_region = room_id + 1;

        let mut candidates: Vec<Connector> = Vec::new();
        for x in bounds.x..bounds.x + bounds.width {
            try_add_connector(
                map, regions, &merged, room_id, room_region, room_count, &room_links,
                x, bounds.y, 0, -1, &mut candidates,
            );
            try_add_connector(
                map, regions, &merged, room_id, room_region, room_count, &room_links,
                x, bounds.y + bounds.height - 1, 0, 1, &mut candidates,
            );
        }
        for y in bounds.y + 1..bounds.y + bounds.height - 1 {
            try_add_connector(
                map, regions, &merged, room_id, room_region, room_count, &room_links,
                bounds.x, y, -1, 0, &mut candidates,
            );
            try_add_connector(
                map, regions, &merged, room_id, room_region, room_count, &room_links,
                bounds.x + bounds.width - 1, y, 1, 0, &mut candidates,
            );
        }

        if candidates.is_empty() {
            continue;
        }

        let chosen = &candidates[rng.range(0, candidates.len() as i32 - 1) as usize];
        let wall_index = map.tile_index(chosen.wall_x, chosen.wall_y);
        map.set_tile(chosen.wall_x, chosen.wall_y, Tile::Floor);
        regions[wall_index] = room_region;

        if chosen.target_room_id >= 0 {
            room_links[(room_id * room_count + chosen.target_room_id) as usize] = true;
            room_links[(chosen.target_room_id * room_count + room_id) as usize] = true;
            map.add_corridor(room_id, chosen.target_room_id, 1, 1)?;
        }

        merged.union(room_region as usize, chosen.target_region as usize);
    }

    Ok(())
}

/// Walls off corridor cells with at most one walkable neighbor. Tiles
/// inside room bounds are never pruned; connector cells are fair game once
/// their maze side disappears. A budget of -1 runs until stable.
fn remove_dead_ends(map: &mut Map, regions: &mut [i32], prune_steps: i32) {
    if prune_steps == 0 {
        return;
    }

    let mut rounds = 0;
    loop {
        let mut to_remove: Vec<usize> = Vec::new();
        for y in 1..map.height() - 1 {
            for x in 1..map.width() - 1 {
                let index = map.tile_index(x, y);
                if !map.get_tile(x, y).is_walkable() {
                    continue;
                }
                if map.point_in_any_room(x, y) {
                    continue;
                }

                let neighbors = CARDINALS
                    .iter()
                    .filter(|&&(dx, dy)| map.get_tile(x + dx, y + dy).is_walkable())
                    .count();
                if neighbors <= 1 {
                    to_remove.push(index);
                }
            }
        }

        if to_remove.is_empty() {
            break;
        }
        for index in to_remove {
            map.set_tile_at(index, Tile::Wall);
            regions[index] = -1;
        }

        rounds += 1;
        if prune_steps > 0 && rounds >= prune_steps {
            break;
        }
    }
}

pub fn generate(request: &GenerateRequest, map: &mut Map, rng: &mut Rng) -> Result<(), GenError> {
    let AlgorithmParams::RoomsAndMazes(config) = &request.params else {
        return Err(GenError::InvalidArgument("rooms+mazes generator needs its own params"));
    };

    map.fill(Tile::Wall);
    map.clear_metadata();

    let mut regions = vec![-1i32; map.tile_count()];

    let next_region_id = place_rooms(config, map, rng, &mut regions)?;
    let next_region_id = generate_maze_regions(
        map,
        &mut regions,
        next_region_id,
        config.maze_wiggle_percent,
        rng,
    );
    connect_rooms_to_regions(map, &mut regions, next_region_id, rng)?;
    remove_dead_ends(map, &mut regions, config.dead_end_prune_steps);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::Algorithm;

    fn request(seed: u64, width: i32, height: i32) -> GenerateRequest {
        GenerateRequest::new(Algorithm::RoomsAndMazes, width, height, seed)
    }

    fn dead_end_count(map: &Map) -> usize {
        let mut count = 0;
        for y in 1..map.height() - 1 {
            for x in 1..map.width() - 1 {
                if !map.get_tile(x, y).is_walkable() {
                    continue;
                }
                if map.point_in_any_room(x, y) {
                    continue;
                }
                let neighbors = CARDINALS
                    .iter()
                    .filter(|&&(dx, dy)| map.get_tile(x + dx, y + dy).is_walkable())
                    .count();
                if neighbors <= 1 {
                    count += 1;
                }
            }
        }
        count
    }

    #[test]
    fn test_unbounded_prune_leaves_no_dead_ends() {
        let req = request(21, 41, 41);
        let mut map = Map::new(41, 41, Tile::Wall).unwrap();
        generate(&req, &mut map, &mut Rng::new(req.seed)).unwrap();
        assert_eq!(dead_end_count(&map), 0);
    }

    #[test]
    fn test_rooms_are_odd_aligned() {
        let req = request(3, 41, 41);
        let mut map = Map::new(41, 41, Tile::Wall).unwrap();
        generate(&req, &mut map, &mut Rng::new(req.seed)).unwrap();
        for room in &map.metadata.rooms {
            assert_eq!(room.bounds.x % 2, 1);
            assert_eq!(room.bounds.y % 2, 1);
            assert_eq!(room.bounds.width % 2, 1);
            assert_eq!(room.bounds.height % 2, 1);
        }
    }

    #[test]
    fn test_minimum_room_count_honored() {
        let req = request(13, 51, 51);
        let mut map = Map::new(51, 51, Tile::Wall).unwrap();
        generate(&req, &mut map, &mut Rng::new(req.seed)).unwrap();
        assert!(map.metadata.rooms.len() >= 10);
    }

    #[test]
    fn test_deterministic() {
        let req = request(456, 35, 35);
        let mut a = Map::new(35, 35, Tile::Wall).unwrap();
        let mut b = Map::new(35, 35, Tile::Wall).unwrap();
        generate(&req, &mut a, &mut Rng::new(req.seed)).unwrap();
        generate(&req, &mut b, &mut Rng::new(req.seed)).unwrap();
        assert_eq!(a.tiles(), b.tiles());
        assert_eq!(a.metadata.corridors, b.metadata.corridors);
    }
}
