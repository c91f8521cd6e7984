//! Runtime metadata recomputation.
//!
//! Rebuilds everything derivable from the tile grid and the room/corridor
//! arenas: tile counts, the CSR adjacency graph, detected room entrances,
//! border edge openings, connectivity stats, and (on the first pass) room
//! role assignment driven by the request constraints.

use crate::connectivity::{analyze_top_down_connectivity, label_components};
use crate::error::GenError;
use crate::geometry::Point;
use crate::map::{
    AdjacencySpan, EdgeOpening, EdgeOpeningRole, EdgeSide, Map, RoomEntrance, RoomNeighbor,
    RoomRole, ROOM_FLAG_SPECIAL,
};
use crate::request::{GenerateRequest, RolePlacementWeights};

/// Entrance normals are probed north, east, south, west.
const ENTRANCE_DIRS: [(i32, i32); 4] = [(0, -1), (1, 0), (0, 1), (-1, 0)];

fn corridor_endpoints_valid(map: &Map, from: i32, to: i32) -> bool {
    from >= 0
        && to >= 0
        && (from as usize) < map.metadata.rooms.len()
        && (to as usize) < map.metadata.rooms.len()
        && from != to
}

fn rebuild_room_adjacency(map: &mut Map) {
    let room_count = map.metadata.rooms.len();
    let mut adjacency: Vec<AdjacencySpan> = Vec::with_capacity(room_count);
    let mut neighbors: Vec<RoomNeighbor> = Vec::new();

    for room_index in 0..room_count {
        let start_index = neighbors.len() as u64;
        for (corridor_index, corridor) in map.metadata.corridors.iter().enumerate() {
            if !corridor_endpoints_valid(map, corridor.from_room_id, corridor.to_room_id) {
                continue;
            }
            let other = if corridor.from_room_id as usize == room_index {
                corridor.to_room_id
            } else if corridor.to_room_id as usize == room_index {
                corridor.from_room_id
            } else {
                continue;
            };
            neighbors.push(RoomNeighbor {
                room_id: other,
                corridor_index: corridor_index as i32,
            });
        }
        adjacency.push(AdjacencySpan {
            start_index,
            count: neighbors.len() as u64 - start_index,
        });
    }

    map.metadata.room_adjacency = adjacency;
    map.metadata.room_neighbors = neighbors;
}

fn collect_room_entrances(map: &Map) -> Vec<RoomEntrance> {
    let mut entrances = Vec::new();
    for room in &map.metadata.rooms {
        let bounds = room.bounds;
        for local_y in 0..bounds.height {
            for local_x in 0..bounds.width {
                let x = bounds.x + local_x;
                let y = bounds.y + local_y;
                if !map.get_tile(x, y).is_walkable() {
                    continue;
                }
                for (dx, dy) in ENTRANCE_DIRS {
                    let nx = x + dx;
                    let ny = y + dy;
                    if !map.in_bounds(nx, ny) {
                        continue;
                    }
                    if bounds.contains(nx, ny) || map.point_in_any_room(nx, ny) {
                        continue;
                    }
                    if !map.get_tile(nx, ny).is_walkable() {
                        continue;
                    }
                    entrances.push(RoomEntrance {
                        room_id: room.id,
                        room_tile: Point::new(x, y),
                        corridor_tile: Point::new(nx, ny),
                        normal: Point::new(dx, dy),
                    });
                    break;
                }
            }
        }
    }
    entrances
}

fn detect_edge_openings(map: &Map, component_labels: &[i32]) -> Vec<EdgeOpening> {
    let mut openings = Vec::new();

    // Side scan order TOP, BOTTOM, LEFT, RIGHT, coordinates ascending.
    for side in [EdgeSide::Top, EdgeSide::Bottom, EdgeSide::Left, EdgeSide::Right] {
        let span = match side {
            EdgeSide::Top | EdgeSide::Bottom => map.width(),
            EdgeSide::Left | EdgeSide::Right => map.height(),
        };

        let tile_at = |coord: i32| -> (i32, i32) {
            match side {
                EdgeSide::Top => (coord, 0),
                EdgeSide::Bottom => (coord, map.height() - 1),
                EdgeSide::Left => (0, coord),
                EdgeSide::Right => (map.width() - 1, coord),
            }
        };

        let mut run_start = -1i32;
        for coord in 0..span {
            let (x, y) = tile_at(coord);
            let open = map.get_tile(x, y).is_walkable();
            if open && run_start < 0 {
                run_start = coord;
            }
            if (!open || coord == span - 1) && run_start >= 0 {
                let run_end = if open { coord } else { coord - 1 };
                let mid = run_start + (run_end - run_start) / 2;
                let (edge_x, edge_y) = tile_at(mid);
                let normal = side.inward_normal();
                let inward = Point::new(edge_x + normal.x, edge_y + normal.y);

                openings.push(EdgeOpening {
                    id: openings.len() as u32,
                    side,
                    start: run_start,
                    end: run_end,
                    length: run_end - run_start + 1,
                    edge_tile: Point::new(edge_x, edge_y),
                    inward_tile: inward,
                    normal,
                    component_id: component_labels[map.tile_index(edge_x, edge_y)],
                    role: EdgeOpeningRole::None,
                });
                run_start = -1;
            }
        }
    }

    openings
}

/// BFS hop distances from one room through the CSR adjacency graph; -1 for
/// unreachable rooms.
fn graph_distances_from(map: &Map, start: usize) -> Vec<i32> {
    let room_count = map.metadata.rooms.len();
    let mut distances = vec![-1i32; room_count];
    if start >= room_count {
        return distances;
    }

    distances[start] = 0;
    let mut queue = vec![start];
    let mut head = 0;
    while head < queue.len() {
        let current = queue[head];
        head += 1;
        let span = &map.metadata.room_adjacency[current];
        let begin = span.start_index as usize;
        let end = begin + span.count as usize;
        for neighbor in &map.metadata.room_neighbors[begin..end] {
            let next = neighbor.room_id as usize;
            if distances[next] < 0 {
                distances[next] = distances[current] + 1;
                queue.push(next);
            }
        }
    }
    distances
}

fn room_degree(map: &Map, room_index: usize) -> u64 {
    map.metadata.room_adjacency[room_index].count
}

fn role_score(
    weights: &RolePlacementWeights,
    distance_from_entrance: i32,
    degree: u64,
    is_leaf: bool,
) -> i64 {
    i64::from(weights.distance_weight) * i64::from(distance_from_entrance.max(0))
        + i64::from(weights.degree_weight) * degree as i64
        + if is_leaf { i64::from(weights.leaf_bonus) } else { 0 }
}

/// Picks the highest-scoring unassigned room, ties to the lower id. When
/// `leaves_only`, rooms with degree != 1 are skipped.
fn pick_role_room(
    map: &Map,
    weights: &RolePlacementWeights,
    distances_from_entrance: &[i32],
    leaves_only: bool,
) -> Option<usize> {
    let mut best: Option<(i64, usize)> = None;
    for (room_index, room) in map.metadata.rooms.iter().enumerate() {
        if room.role != RoomRole::None {
            continue;
        }
        let degree = room_degree(map, room_index);
        if leaves_only && degree != 1 {
            continue;
        }
        let distance = distances_from_entrance.get(room_index).copied().unwrap_or(-1);
        let score = role_score(weights, distance, degree, degree == 1);
        match best {
            Some((best_score, _)) if score <= best_score => {}
            _ => best = Some((score, room_index)),
        }
    }
    best.map(|(_, index)| index)
}

fn assign_room_roles(request: &GenerateRequest, map: &mut Map) {
    let constraints = &request.constraints;
    let required_total = constraints.required_entrance_rooms
        + constraints.required_exit_rooms
        + constraints.required_boss_rooms
        + constraints.required_treasure_rooms
        + constraints.required_shop_rooms;
    if required_total == 0 || map.metadata.rooms.is_empty() {
        return;
    }

    for room in &mut map.metadata.rooms {
        room.role = RoomRole::None;
    }

    let room_count = map.metadata.rooms.len();

    // Seed the entrance/exit pair at maximum graph distance; the first
    // maximal pair in room-id order wins.
    if constraints.required_entrance_rooms >= 1 && constraints.required_exit_rooms >= 1 && room_count >= 2
    {
        let mut best_pair: Option<(usize, usize)> = None;
        let mut best_distance = -1i32;
        for a in 0..room_count {
            let distances = graph_distances_from(map, a);
            for (b, &distance) in distances.iter().enumerate() {
                if b == a || distance < 0 {
                    continue;
                }
                if distance > best_distance {
                    best_distance = distance;
                    best_pair = Some((a, b));
                }
            }
        }
        if let Some((entrance, exit)) = best_pair {
            map.metadata.rooms[entrance].role = RoomRole::Entrance;
            map.metadata.rooms[exit].role = RoomRole::Exit;
        }
    }

    let entrance_index = map
        .metadata
        .rooms
        .iter()
        .position(|room| room.role == RoomRole::Entrance);
    let distances_from_entrance = match entrance_index {
        Some(index) => graph_distances_from(map, index),
        None => vec![0; room_count],
    };

    let mut fill_role = |role: RoomRole, required: i32, weights: &RolePlacementWeights, map: &mut Map| {
        let already = map.metadata.rooms.iter().filter(|r| r.role == role).count() as i32;
        for _ in already..required {
            let leaves_only = role == RoomRole::Boss && constraints.require_boss_on_leaf;
            let choice = pick_role_room(map, weights, &distances_from_entrance, leaves_only)
                .or_else(|| {
                    if leaves_only {
                        pick_role_room(map, weights, &distances_from_entrance, false)
                    } else {
                        None
                    }
                });
            let Some(room_index) = choice else { break };
            map.metadata.rooms[room_index].role = role;
        }
    };

    fill_role(
        RoomRole::Entrance,
        constraints.required_entrance_rooms,
        &constraints.entrance_weights,
        map,
    );
    fill_role(RoomRole::Exit, constraints.required_exit_rooms, &constraints.exit_weights, map);
    fill_role(RoomRole::Boss, constraints.required_boss_rooms, &constraints.boss_weights, map);
    fill_role(
        RoomRole::Treasure,
        constraints.required_treasure_rooms,
        &constraints.treasure_weights,
        map,
    );
    fill_role(RoomRole::Shop, constraints.required_shop_rooms, &constraints.shop_weights, map);
}

fn compute_entrance_exit_distance(map: &Map) -> i32 {
    let entrance = map
        .metadata
        .rooms
        .iter()
        .position(|room| room.role == RoomRole::Entrance);
    let exit = map
        .metadata
        .rooms
        .iter()
        .position(|room| room.role == RoomRole::Exit);
    match (entrance, exit) {
        (Some(entrance), Some(exit)) => graph_distances_from(map, entrance)[exit],
        _ => -1,
    }
}

/// Recomputes every derived metadata field. `assign_roles` runs the
/// constraint-driven role placement; the final pass keeps whatever roles the
/// first pass chose and only recounts.
pub fn populate_runtime_metadata(
    map: &mut Map,
    request: &GenerateRequest,
    attempt_seed: u64,
    generation_attempts: u64,
    assign_roles: bool,
) -> Result<(), GenError> {
    map.metadata.seed = attempt_seed;
    map.metadata.algorithm_id = request.algorithm() as i32;
    map.metadata.generation_class = request.algorithm().generation_class();
    map.metadata.generation_attempts = generation_attempts;

    let mut walkable = 0u64;
    let mut walls = 0u64;
    for tile in map.tiles() {
        if tile.is_walkable() {
            walkable += 1;
        }
        if *tile == crate::map::Tile::Wall {
            walls += 1;
        }
    }

    rebuild_room_adjacency(map);

    if assign_roles && map.metadata.generation_class == crate::map::GenerationClass::RoomLike {
        assign_room_roles(request, map);
    }

    map.metadata.room_entrances = collect_room_entrances(map);

    let (labels, _) = label_components(map);
    map.metadata.edge_openings = detect_edge_openings(map, &labels);

    let stats = analyze_top_down_connectivity(map);

    let metadata = &mut map.metadata;
    metadata.walkable_tile_count = walkable;
    metadata.wall_tile_count = walls;
    metadata.special_room_count = metadata
        .rooms
        .iter()
        .filter(|room| room.flags & ROOM_FLAG_SPECIAL != 0)
        .count() as u64;
    metadata.entrance_room_count = metadata
        .rooms
        .iter()
        .filter(|r| r.role == RoomRole::Entrance)
        .count() as u64;
    metadata.exit_room_count = metadata
        .rooms
        .iter()
        .filter(|r| r.role == RoomRole::Exit)
        .count() as u64;
    metadata.boss_room_count = metadata
        .rooms
        .iter()
        .filter(|r| r.role == RoomRole::Boss)
        .count() as u64;
    metadata.treasure_room_count = metadata
        .rooms
        .iter()
        .filter(|r| r.role == RoomRole::Treasure)
        .count() as u64;
    metadata.shop_room_count = metadata
        .rooms
        .iter()
        .filter(|r| r.role == RoomRole::Shop)
        .count() as u64;
    metadata.leaf_room_count = metadata
        .room_adjacency
        .iter()
        .filter(|span| span.count == 1)
        .count() as u64;
    metadata.corridor_total_length = metadata
        .corridors
        .iter()
        .map(|corridor| corridor.length.max(0) as u64)
        .sum();
    metadata.connected_component_count = stats.component_count;
    metadata.largest_component_size = stats.largest_component_size;
    metadata.connected_floor = stats.connected_floor;

    map.metadata.entrance_exit_distance = compute_entrance_exit_distance(map);
    Ok(())
}

/// Transfers requested opening roles onto the detected openings: each spec
/// with a role marks the same-side opening with the largest range overlap.
/// The primary ids point at the first entrance/exit openings.
pub fn apply_explicit_edge_opening_roles(request: &GenerateRequest, map: &mut Map) {
    for spec in &request.edge_openings {
        if spec.role == EdgeOpeningRole::None {
            continue;
        }

        let mut best: Option<(i32, usize)> = None;
        for (index, opening) in map.metadata.edge_openings.iter().enumerate() {
            if opening.side != spec.side {
                continue;
            }
            let overlap = (opening.end.min(spec.end) - opening.start.max(spec.start)) + 1;
            if overlap <= 0 {
                continue;
            }
            match best {
                Some((best_overlap, _)) if overlap <= best_overlap => {}
                _ => best = Some((overlap, index)),
            }
        }

        if let Some((_, index)) = best {
            map.metadata.edge_openings[index].role = spec.role;
        }
    }

    map.metadata.primary_entrance_opening_id = map
        .metadata
        .edge_openings
        .iter()
        .find(|opening| opening.role == EdgeOpeningRole::Entrance)
        .map(|opening| opening.id as i32)
        .unwrap_or(-1);
    map.metadata.primary_exit_opening_id = map
        .metadata
        .edge_openings
        .iter()
        .find(|opening| opening.role == EdgeOpeningRole::Exit)
        .map(|opening| opening.id as i32)
        .unwrap_or(-1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Rect;
    use crate::map::{EdgeOpeningSpec, GenerationClass, Tile, ROOM_FLAG_NONE};
    use crate::request::Algorithm;

    fn linked_rooms_map() -> (Map, GenerateRequest) {
        let mut map = Map::new(24, 24, Tile::Wall).unwrap();
        map.metadata.generation_class = GenerationClass::RoomLike;
        for bounds in [
            Rect::new(1, 1, 4, 4),
            Rect::new(10, 1, 4, 4),
            Rect::new(18, 1, 4, 4),
        ] {
            for y in bounds.y..bounds.y + bounds.height {
                for x in bounds.x..bounds.x + bounds.width {
                    map.set_tile(x, y, Tile::Floor);
                }
            }
            map.add_room(bounds, ROOM_FLAG_NONE).unwrap();
        }
        map.add_corridor(0, 1, 1, 6).unwrap();
        map.add_corridor(1, 2, 1, 5).unwrap();
        let request = GenerateRequest::new(Algorithm::BspTree, 24, 24, 1);
        (map, request)
    }

    #[test]
    fn test_adjacency_is_csr_over_corridors() {
        let (mut map, request) = linked_rooms_map();
        populate_runtime_metadata(&mut map, &request, 1, 1, false).unwrap();

        let adjacency = &map.metadata.room_adjacency;
        assert_eq!(adjacency.len(), 3);
        assert_eq!(adjacency[0].count, 1);
        assert_eq!(adjacency[1].count, 2);
        assert_eq!(adjacency[2].count, 1);

        let middle_start = adjacency[1].start_index as usize;
        let neighbor_rooms: Vec<i32> = map.metadata.room_neighbors
            [middle_start..middle_start + 2]
            .iter()
            .map(|n| n.room_id)
            .collect();
        assert_eq!(neighbor_rooms, vec![0, 2]);
        assert_eq!(map.metadata.leaf_room_count, 2);
        assert_eq!(map.metadata.corridor_total_length, 11);
    }

    #[test]
    fn test_role_assignment_places_entrance_exit_far_apart() {
        let (mut map, mut request) = linked_rooms_map();
        request.constraints.required_entrance_rooms = 1;
        request.constraints.required_exit_rooms = 1;
        populate_runtime_metadata(&mut map, &request, 1, 1, true).unwrap();

        // Rooms 0 and 2 are two hops apart; the pair (0, 2) is maximal.
        assert_eq!(map.metadata.rooms[0].role, RoomRole::Entrance);
        assert_eq!(map.metadata.rooms[2].role, RoomRole::Exit);
        assert_eq!(map.metadata.entrance_exit_distance, 2);
        assert_eq!(map.metadata.entrance_room_count, 1);
        assert_eq!(map.metadata.exit_room_count, 1);
    }

    #[test]
    fn test_boss_on_leaf_restriction() {
        let (mut map, mut request) = linked_rooms_map();
        request.constraints.required_entrance_rooms = 1;
        request.constraints.required_exit_rooms = 1;
        request.constraints.required_boss_rooms = 1;
        request.constraints.require_boss_on_leaf = true;
        populate_runtime_metadata(&mut map, &request, 1, 1, true).unwrap();

        let boss = map
            .metadata
            .rooms
            .iter()
            .position(|r| r.role == RoomRole::Boss);
        // Both leaves carry entrance/exit; the leaf fallback picks the one
        // remaining room regardless of degree, or no boss at all -- either
        // way the acceptance test decides. Here room 1 is the only free one.
        assert_eq!(boss, Some(1));
    }

    #[test]
    fn test_edge_openings_detected_with_components() {
        let mut map = Map::new(12, 8, Tile::Wall).unwrap();
        for x in 3..=5 {
            map.set_tile(x, 0, Tile::Floor);
            map.set_tile(x, 1, Tile::Floor);
        }
        map.set_tile(0, 4, Tile::Floor);
        map.set_tile(1, 4, Tile::Floor);

        let request = GenerateRequest::new(Algorithm::OrganicCave, 12, 8, 1);
        populate_runtime_metadata(&mut map, &request, 1, 1, false).unwrap();

        let openings = &map.metadata.edge_openings;
        assert_eq!(openings.len(), 2);
        assert_eq!(openings[0].side, EdgeSide::Top);
        assert_eq!(openings[0].start, 3);
        assert_eq!(openings[0].end, 5);
        assert_eq!(openings[0].length, 3);
        assert_eq!(openings[0].edge_tile, Point::new(4, 0));
        assert_eq!(openings[0].inward_tile, Point::new(4, 1));
        assert_eq!(openings[1].side, EdgeSide::Left);
        // Two separate walkable blobs, two component ids.
        assert_ne!(openings[0].component_id, openings[1].component_id);
    }

    #[test]
    fn test_explicit_roles_land_on_best_overlap() {
        let mut map = Map::new(12, 8, Tile::Wall).unwrap();
        for x in 2..=4 {
            map.set_tile(x, 0, Tile::Floor);
        }
        for x in 8..=9 {
            map.set_tile(x, 0, Tile::Floor);
        }
        let mut request = GenerateRequest::new(Algorithm::OrganicCave, 12, 8, 1);
        request.edge_openings.push(EdgeOpeningSpec {
            side: EdgeSide::Top,
            start: 8,
            end: 9,
            role: EdgeOpeningRole::Exit,
        });
        populate_runtime_metadata(&mut map, &request, 1, 1, false).unwrap();
        apply_explicit_edge_opening_roles(&request, &mut map);

        assert_eq!(map.metadata.edge_openings[0].role, EdgeOpeningRole::None);
        assert_eq!(map.metadata.edge_openings[1].role, EdgeOpeningRole::Exit);
        assert_eq!(map.metadata.primary_exit_opening_id, 1);
        assert_eq!(map.metadata.primary_entrance_opening_id, -1);
    }

    #[test]
    fn test_room_entrances_record_normals() {
        let (mut map, request) = linked_rooms_map();
        // Carve a one-tile corridor stub east of room 0.
        map.set_tile(5, 2, Tile::Floor);
        populate_runtime_metadata(&mut map, &request, 1, 1, false).unwrap();

        let entrance = map
            .metadata
            .room_entrances
            .iter()
            .find(|e| e.room_id == 0)
            .unwrap();
        assert_eq!(entrance.room_tile, Point::new(4, 2));
        assert_eq!(entrance.corridor_tile, Point::new(5, 2));
        assert_eq!(entrance.normal, Point::new(1, 0));
    }
}
