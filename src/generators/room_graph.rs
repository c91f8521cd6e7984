//! Room placement plus a nearest-neighbor candidate graph: Kruskal MST for
//! the backbone, optional extra edges for cycles.

use petgraph::unionfind::UnionFind;

use crate::error::GenError;
use crate::generators::l_path_length;
use crate::geometry::{carve_l_path, carve_rect, Rect};
use crate::map::{Map, Tile, ROOM_FLAG_NONE};
use crate::request::{AlgorithmParams, GenerateRequest};
use crate::rng::Rng;

#[derive(Debug, Clone, Copy)]
struct CandidateEdge {
    a: usize,
    b: usize,
    weight: i64,
    in_mst: bool,
}

fn room_center_distance_sq(map: &Map, a: usize, b: usize) -> i64 {
    let ca = map.metadata.rooms[a].bounds.center();
    let cb = map.metadata.rooms[b].bounds.center();
    let dx = i64::from(ca.x - cb.x);
    let dy = i64::from(ca.y - cb.y);
    dx * dx + dy * dy
}

/// Each room contributes edges to its `neighbor_candidates` nearest rooms by
/// squared center distance, tie-broken by room id. Duplicate (a,b) pairs are
/// collapsed.
fn build_candidate_edges(map: &Map, neighbor_candidates: i32) -> Vec<CandidateEdge> {
    let room_count = map.metadata.rooms.len();
    let keep_count = neighbor_candidates.clamp(1, 8) as usize;
    let mut edges: Vec<CandidateEdge> = Vec::new();

    for i in 0..room_count {
        let mut nearest: Vec<(i64, usize)> = Vec::with_capacity(keep_count + 1);
        for j in 0..room_count {
            if i == j {
                continue;
            }
            let dist = room_center_distance_sq(map, i, j);
            // Insertion sort keeps the list ordered by (distance, id).
            let position = nearest
                .iter()
                .position(|&(d, id)| dist < d || (dist == d && j < id))
                .unwrap_or(nearest.len());
            nearest.insert(position, (dist, j));
            nearest.truncate(keep_count);
        }

        for (dist, j) in nearest {
            let (a, b) = if i < j { (i, j) } else { (j, i) };
            if edges.iter().any(|edge| edge.a == a && edge.b == b) {
                continue;
            }
            edges.push(CandidateEdge {
                a,
                b,
                weight: dist,
                in_mst: false,
            });
        }
    }

    if edges.is_empty() {
        for i in 1..room_count {
            edges.push(CandidateEdge {
                a: i - 1,
                b: i,
                weight: 1,
                in_mst: false,
            });
        }
    }

    edges
}

fn connect_rooms(
    map: &mut Map,
    rng: &mut Rng,
    a: usize,
    b: usize,
    connected: &mut [bool],
    room_count: usize,
) -> Result<(), GenError> {
    if connected[a * room_count + b] {
        return Ok(());
    }

    let ca = map.metadata.rooms[a].bounds.center();
    let cb = map.metadata.rooms[b].bounds.center();
    carve_l_path(map, ca, cb, 1, rng.coin_flip());
    map.add_corridor(a as i32, b as i32, 1, l_path_length(ca.x, ca.y, cb.x, cb.y))?;

    connected[a * room_count + b] = true;
    connected[b * room_count + a] = true;
    Ok(())
}

pub fn generate(request: &GenerateRequest, map: &mut Map, rng: &mut Rng) -> Result<(), GenError> {
    let AlgorithmParams::RoomGraph(config) = &request.params else {
        return Err(GenError::InvalidArgument("room graph generator needs its own params"));
    };

    map.fill(Tile::Wall);
    map.clear_metadata();

    let target_rooms = rng.range(config.min_rooms, config.max_rooms);
    let max_place_attempts = (target_rooms * 80).max(400);

    let mut placed = 0;
    let mut attempt = 0;
    while attempt < max_place_attempts && placed < target_rooms {
        attempt += 1;

        let max_width = config.room_max_size.min(map.width() - 4);
        let max_height = config.room_max_size.min(map.height() - 4);
        if max_width < config.room_min_size || max_height < config.room_min_size {
            break;
        }

        let width = rng.range(config.room_min_size, max_width);
        let height = rng.range(config.room_min_size, max_height);
        if map.width() - width - 2 <= 1 || map.height() - height - 2 <= 1 {
            continue;
        }

        let x = rng.range(1, map.width() - width - 2);
        let y = rng.range(1, map.height() - height - 2);
        let room = Rect::new(x, y, width, height);

        if map
            .metadata
            .rooms
            .iter()
            .any(|placed_room| placed_room.bounds.overlaps_with_padding(&room, 1))
        {
            continue;
        }

        carve_rect(map, &room);
        map.add_room(room, ROOM_FLAG_NONE)?;
        placed += 1;
    }

    let room_count = map.metadata.rooms.len();
    if room_count < 2 {
        return Err(GenError::GenerationFailed("need at least two rooms for a graph"));
    }

    let mut edges = build_candidate_edges(map, config.neighbor_candidates);
    if edges.is_empty() {
        return Err(GenError::GenerationFailed("no candidate edges"));
    }
    edges.sort_by(|x, y| x.weight.cmp(&y.weight).then(x.a.cmp(&y.a)).then(x.b.cmp(&y.b)));

    let mut connected = vec![false; room_count * room_count];
    let mut union_find: UnionFind<usize> = UnionFind::new(room_count);

    let mut mst_edges = 0;
    for edge in edges.iter_mut() {
        if !union_find.union(edge.a, edge.b) {
            continue;
        }
        connect_rooms(map, rng, edge.a, edge.b, &mut connected, room_count)?;
        edge.in_mst = true;
        mst_edges += 1;
        if mst_edges >= room_count - 1 {
            break;
        }
    }

    if mst_edges < room_count - 1 {
        return Err(GenError::GenerationFailed("candidate graph is disconnected"));
    }

    for edge in &edges {
        if edge.in_mst {
            continue;
        }
        if rng.range(0, 99) >= config.extra_connection_chance_percent {
            continue;
        }
        connect_rooms(map, rng, edge.a, edge.b, &mut connected, room_count)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectivity::analyze_top_down_connectivity;
    use crate::request::{Algorithm, RoomGraphConfig};

    #[test]
    fn test_spanning_tree_connects_everything() {
        let mut req = GenerateRequest::new(Algorithm::RoomGraph, 48, 48, 8);
        req.params = AlgorithmParams::RoomGraph(RoomGraphConfig {
            extra_connection_chance_percent: 0,
            ..Default::default()
        });
        let mut map = Map::new(48, 48, Tile::Wall).unwrap();
        generate(&req, &mut map, &mut Rng::new(req.seed)).unwrap();

        let rooms = map.metadata.rooms.len();
        assert!(rooms >= 2);
        // MST only: exactly rooms-1 corridors, one walkable component.
        assert_eq!(map.metadata.corridors.len(), rooms - 1);
        assert_eq!(analyze_top_down_connectivity(&map).component_count, 1);
    }

    #[test]
    fn test_extra_connections_add_cycles() {
        let mut req = GenerateRequest::new(Algorithm::RoomGraph, 48, 48, 8);
        req.params = AlgorithmParams::RoomGraph(RoomGraphConfig {
            extra_connection_chance_percent: 100,
            ..Default::default()
        });
        let mut map = Map::new(48, 48, Tile::Wall).unwrap();
        generate(&req, &mut map, &mut Rng::new(req.seed)).unwrap();
        assert!(map.metadata.corridors.len() >= map.metadata.rooms.len() - 1);
    }

    #[test]
    fn test_deterministic() {
        let req = GenerateRequest::new(Algorithm::RoomGraph, 40, 40, 2024);
        let mut a = Map::new(40, 40, Tile::Wall).unwrap();
        let mut b = Map::new(40, 40, Tile::Wall).unwrap();
        generate(&req, &mut a, &mut Rng::new(req.seed)).unwrap();
        generate(&req, &mut b, &mut Rng::new(req.seed)).unwrap();
        assert_eq!(a.tiles(), b.tiles());
        assert_eq!(a.metadata.corridors, b.metadata.corridors);
    }

    #[test]
    fn test_too_small_map_fails() {
        let req = GenerateRequest::new(Algorithm::RoomGraph, 9, 9, 4);
        let mut map = Map::new(9, 9, Tile::Wall).unwrap();
        assert!(matches!(
            generate(&req, &mut map, &mut Rng::new(req.seed)),
            Err(GenError::GenerationFailed(_))
        ));
    }
}
