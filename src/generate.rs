//! Generation orchestrator.
//!
//! Sequences one attempt as: base generation, metadata + role pass, room
//! typing, template stamping, post-processing, outer walls, connectivity
//! enforcement, explicit edge openings, metadata recomputation, edge roles,
//! acceptance, snapshot. A `GENERATION_FAILED` attempt retries with
//! `seed + attempt` up to the request's attempt budget; any other error is
//! terminal. No partially-initialized map ever escapes.

use tracing::{debug, info};

use crate::connectivity::enforce_single_connected_region;
use crate::error::GenError;
use crate::generators::run_base_generator;
use crate::geometry::{has_outer_walls, paint_outer_walls};
use crate::map::{Map, RequestSnapshot, RoomRole, Tile};
use crate::metadata::{apply_explicit_edge_opening_roles, populate_runtime_metadata};
use crate::process::apply_post_processes;
use crate::request::{validate_request, GenerateRequest};
use crate::rng::Rng;
use crate::room_types::apply_room_type_assignment;
use crate::templates::{apply_room_type_templates, enforce_opening_connectivity};

/// Public minimum map extent.
const MIN_PUBLIC_DIMENSION: i32 = 8;
/// Template sub-generation may go smaller.
const MIN_TEMPLATE_DIMENSION: i32 = 5;

fn apply_forbidden_regions(request: &GenerateRequest, map: &mut Map) {
    for region in &request.constraints.forbidden_regions {
        let Some((x0, y0, x1, y1)) = region.clamp_to_map(map) else {
            continue;
        };
        for y in y0..y1 {
            for x in x0..x1 {
                map.set_tile(x, y, Tile::Wall);
            }
        }
    }
}

fn forbidden_regions_are_clear(request: &GenerateRequest, map: &Map) -> bool {
    for region in &request.constraints.forbidden_regions {
        let Some((x0, y0, x1, y1)) = region.clamp_to_map(map) else {
            continue;
        };
        for y in y0..y1 {
            for x in x0..x1 {
                if map.get_tile(x, y).is_walkable() {
                    return false;
                }
            }
        }
    }
    true
}

/// Post-generation acceptance test against the request constraints.
fn constraints_satisfied(request: &GenerateRequest, map: &Map) -> bool {
    let constraints = &request.constraints;
    let total_cells = map.tile_count() as f32;
    if total_cells <= 0.0 {
        return false;
    }

    const EPSILON: f32 = 1e-4;
    let coverage = map.metadata.walkable_tile_count as f32 / total_cells;
    if coverage + EPSILON < constraints.min_floor_coverage {
        return false;
    }
    if coverage - EPSILON > constraints.max_floor_coverage {
        return false;
    }

    let room_count = map.metadata.rooms.len() as i32;
    if constraints.min_room_count > 0 && room_count < constraints.min_room_count {
        return false;
    }
    if constraints.max_room_count > 0 && room_count > constraints.max_room_count {
        return false;
    }
    if constraints.min_special_rooms > 0
        && (map.metadata.special_room_count as i32) < constraints.min_special_rooms
    {
        return false;
    }

    if constraints.required_entrance_rooms > 0
        && (map.metadata.entrance_room_count as i32) < constraints.required_entrance_rooms
    {
        return false;
    }
    if constraints.required_exit_rooms > 0
        && (map.metadata.exit_room_count as i32) < constraints.required_exit_rooms
    {
        return false;
    }
    if constraints.required_boss_rooms > 0
        && (map.metadata.boss_room_count as i32) < constraints.required_boss_rooms
    {
        return false;
    }
    if constraints.required_treasure_rooms > 0
        && (map.metadata.treasure_room_count as i32) < constraints.required_treasure_rooms
    {
        return false;
    }
    if constraints.required_shop_rooms > 0
        && (map.metadata.shop_room_count as i32) < constraints.required_shop_rooms
    {
        return false;
    }

    if constraints.min_entrance_exit_distance > 0
        && map.metadata.entrance_exit_distance < constraints.min_entrance_exit_distance
    {
        return false;
    }

    if constraints.require_boss_on_leaf {
        for (index, room) in map.metadata.rooms.iter().enumerate() {
            if room.role == RoomRole::Boss && map.metadata.room_adjacency[index].count != 1 {
                return false;
            }
        }
    }

    if constraints.require_connected_floor && !map.metadata.connected_floor {
        return false;
    }
    if constraints.enforce_outer_walls && !outer_walls_satisfied(request, map) {
        return false;
    }

    forbidden_regions_are_clear(request, map)
}

/// Outer-wall acceptance, with requested edge-opening spans exempt.
fn outer_walls_satisfied(request: &GenerateRequest, map: &Map) -> bool {
    if request.edge_openings.is_empty() {
        return has_outer_walls(map);
    }

    let exempt = |side: crate::map::EdgeSide, coord: i32| {
        request
            .edge_openings
            .iter()
            .any(|spec| spec.side == side && coord >= spec.start && coord <= spec.end)
    };

    for x in 0..map.width() {
        if map.get_tile(x, 0) != Tile::Wall && !exempt(crate::map::EdgeSide::Top, x) {
            return false;
        }
        if map.get_tile(x, map.height() - 1) != Tile::Wall && !exempt(crate::map::EdgeSide::Bottom, x) {
            return false;
        }
    }
    for y in 0..map.height() {
        if map.get_tile(0, y) != Tile::Wall && !exempt(crate::map::EdgeSide::Left, y) {
            return false;
        }
        if map.get_tile(map.width() - 1, y) != Tile::Wall && !exempt(crate::map::EdgeSide::Right, y) {
            return false;
        }
    }
    true
}

fn capture_snapshot(request: &GenerateRequest, map: &mut Map) {
    let mut policy = request.room_types.policy.clone();
    // The untyped-template path is host-local state, not part of the
    // replayable snapshot.
    policy.untyped_template_map_path.clear();

    map.metadata.generation_request = RequestSnapshot {
        present: true,
        width: request.width,
        height: request.height,
        seed: request.seed,
        algorithm_id: request.algorithm() as i32,
        params: request.params,
        methods: if request.process.enabled == 1 {
            request.process.methods.clone()
        } else {
            Vec::new()
        },
        policy,
        definitions: request.room_types.definitions.clone(),
    };
}

fn generate_attempt(
    request: &GenerateRequest,
    attempt_seed: u64,
    attempt_index: i32,
) -> Result<Map, GenError> {
    let mut map = Map::new(request.width, request.height, Tile::Wall)?;
    let mut rng = Rng::new(attempt_seed);

    run_base_generator(request, &mut map, &mut rng)?;
    apply_forbidden_regions(request, &mut map);

    populate_runtime_metadata(&mut map, request, attempt_seed, attempt_index as u64 + 1, true)?;
    apply_room_type_assignment(request, &mut map, &mut rng)?;
    apply_room_type_templates(request, &mut map)?;
    apply_post_processes(request, &mut map, &mut rng)?;

    paint_outer_walls(&mut map);
    if request.constraints.require_connected_floor {
        enforce_single_connected_region(&mut map);
    }
    // Openings are patched through the fresh border wall and, if isolated,
    // carved back to the interior so a connectivity requirement can hold.
    enforce_opening_connectivity(&mut map, &request.edge_openings, false);
    apply_forbidden_regions(request, &mut map);

    if map.count_walkable() == 0 {
        return Err(GenError::GenerationFailed("map has no walkable tiles"));
    }

    populate_runtime_metadata(&mut map, request, attempt_seed, attempt_index as u64 + 1, false)?;
    apply_explicit_edge_opening_roles(request, &mut map);

    if !constraints_satisfied(request, &map) {
        return Err(GenError::GenerationFailed("constraints rejected the attempt"));
    }

    capture_snapshot(request, &mut map);
    Ok(map)
}

fn generate_impl(request: &GenerateRequest, min_dimension: i32) -> Result<Map, GenError> {
    if request.width < min_dimension || request.height < min_dimension {
        return Err(GenError::InvalidArgument("map dimensions below the supported minimum"));
    }
    validate_request(request)?;

    let max_attempts = request.constraints.max_generation_attempts;
    for attempt in 0..max_attempts {
        let attempt_seed = request.seed.wrapping_add(attempt as u64);
        match generate_attempt(request, attempt_seed, attempt) {
            Ok(map) => {
                info!(
                    algorithm = request.algorithm().name(),
                    seed = request.seed,
                    attempt = attempt + 1,
                    rooms = map.metadata.rooms.len(),
                    walkable = map.metadata.walkable_tile_count,
                    "map generated"
                );
                return Ok(map);
            }
            Err(error) if error.is_retryable() => {
                debug!(
                    algorithm = request.algorithm().name(),
                    seed = attempt_seed,
                    attempt = attempt + 1,
                    %error,
                    "generation attempt rejected"
                );
            }
            Err(error) => return Err(error),
        }
    }

    Err(GenError::GenerationFailed("attempt budget exhausted"))
}

/// Deterministic map generation: identical `(request, seed)` pairs produce
/// bit-identical maps, metadata, and diagnostics.
pub fn generate(request: &GenerateRequest) -> Result<Map, GenError> {
    generate_impl(request, MIN_PUBLIC_DIMENSION)
}

/// Template sub-generation path; relaxes the public size minimum.
pub(crate) fn generate_for_template(request: &GenerateRequest) -> Result<Map, GenError> {
    generate_impl(request, MIN_TEMPLATE_DIMENSION)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Rect;
    use crate::map::{EdgeOpeningRole, EdgeOpeningSpec, EdgeSide};
    use crate::request::Algorithm;

    #[test]
    fn test_rejects_small_maps_publicly() {
        let request = GenerateRequest::new(Algorithm::OrganicCave, 7, 7, 1);
        assert!(matches!(
            generate(&request),
            Err(GenError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_generates_connected_walled_cave() {
        let mut request = GenerateRequest::new(Algorithm::OrganicCave, 24, 20, 9);
        request.constraints.require_connected_floor = true;
        request.constraints.enforce_outer_walls = true;

        let map = generate(&request).unwrap();
        assert!(map.metadata.connected_floor);
        assert!(has_outer_walls(&map));
        assert_eq!(map.metadata.generation_attempts, 1);
        assert!(map.metadata.generation_request.present);
        assert_eq!(map.metadata.generation_request.seed, 9);
    }

    #[test]
    fn test_attempt_retry_shifts_seed() {
        let mut request = GenerateRequest::new(Algorithm::OrganicCave, 24, 20, 50);
        // An impossible coverage window forces every attempt to fail.
        request.constraints.min_floor_coverage = 0.99;
        request.constraints.max_floor_coverage = 1.0;
        request.constraints.max_generation_attempts = 3;
        assert!(matches!(
            generate(&request),
            Err(GenError::GenerationFailed(_))
        ));
    }

    #[test]
    fn test_forbidden_regions_hold_in_result() {
        let mut request = GenerateRequest::new(Algorithm::DrunkardsWalk, 32, 32, 4);
        request.constraints.require_connected_floor = false;
        request.constraints.forbidden_regions.push(Rect::new(10, 10, 6, 6));

        let map = generate(&request).unwrap();
        for y in 10..16 {
            for x in 10..16 {
                assert!(!map.get_tile(x, y).is_walkable());
            }
        }
    }

    #[test]
    fn test_explicit_edge_openings_are_carved_and_tagged() {
        let mut request = GenerateRequest::new(Algorithm::OrganicCave, 24, 24, 77);
        request.constraints.enforce_outer_walls = true;
        request.constraints.require_connected_floor = false;
        request.edge_openings.push(EdgeOpeningSpec {
            side: EdgeSide::Top,
            start: 10,
            end: 12,
            role: EdgeOpeningRole::Entrance,
        });

        let map = generate(&request).unwrap();
        for x in 10..=12 {
            assert!(map.get_tile(x, 0).is_walkable());
        }
        assert!(map.metadata.primary_entrance_opening_id >= 0);
        let opening =
            &map.metadata.edge_openings[map.metadata.primary_entrance_opening_id as usize];
        assert_eq!(opening.role, EdgeOpeningRole::Entrance);
        assert_eq!(opening.side, EdgeSide::Top);
    }

    #[test]
    fn test_determinism_across_runs() {
        let request = GenerateRequest::new(Algorithm::BspTree, 40, 32, 1234);
        let a = generate(&request).unwrap();
        let b = generate(&request).unwrap();
        assert_eq!(a, b);
    }
}
