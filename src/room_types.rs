//! Constraint-satisfying room-type assignment.
//!
//! Rooms are scored against enabled type definitions, minimums are filled in
//! ascending-slack order, the remainder greedily, and strict mode turns any
//! unmet quota into a generation failure. Quota diagnostics are written for
//! every definition regardless of policy.

use crate::error::GenError;
use crate::map::{GenerationClass, Map, RoomTypeQuotaDiagnostics, ROOM_TYPE_UNASSIGNED};
use crate::request::{GenerateRequest, RoomTypeDefinition};
use crate::rng::Rng;

const DEPTH_UNREACHABLE: u64 = u64::MAX;

/// Bonus applied while a type is still below its target count.
const BELOW_TARGET_BONUS: i64 = 100_000_000_000;
/// Bonus applied while a type is still below its minimum count.
const BELOW_MIN_BONUS: i64 = 200_000_000_000;

#[derive(Debug, Clone, Copy, Default)]
struct RoomFeatures {
    area: u64,
    degree: u64,
    border_distance: u64,
    graph_depth: u64,
}

fn value_in_range(value: u64, min_value: i32, max_value: i32) -> bool {
    if min_value >= 0 && value < min_value as u64 {
        return false;
    }
    if max_value != -1 && value > max_value as u64 {
        return false;
    }
    true
}

fn room_degree_from_corridors(map: &Map, room_index: usize) -> u64 {
    map.metadata
        .corridors
        .iter()
        .filter(|corridor| {
            let from = corridor.from_room_id;
            let to = corridor.to_room_id;
            from >= 0
                && to >= 0
                && (from as usize) < map.metadata.rooms.len()
                && (to as usize) < map.metadata.rooms.len()
                && from != to
                && (from as usize == room_index || to as usize == room_index)
        })
        .count() as u64
}

fn compute_features(map: &Map) -> Result<Vec<RoomFeatures>, GenError> {
    let room_count = map.metadata.rooms.len();
    let mut features = vec![RoomFeatures::default(); room_count];
    let use_adjacency = !map.metadata.room_adjacency.is_empty()
        && map.metadata.room_adjacency.len() == room_count;

    for (i, feature) in features.iter_mut().enumerate() {
        let bounds = &map.metadata.rooms[i].bounds;
        if bounds.width <= 0 || bounds.height <= 0 {
            return Err(GenError::GenerationFailed("degenerate room bounds"));
        }
        feature.area = bounds.width as u64 * bounds.height as u64;
        feature.graph_depth = DEPTH_UNREACHABLE;
        feature.degree = if use_adjacency {
            map.metadata.room_adjacency[i].count
        } else {
            room_degree_from_corridors(map, i)
        };

        let left = i64::from(bounds.x);
        let top = i64::from(bounds.y);
        let right = i64::from(map.width()) - (i64::from(bounds.x) + i64::from(bounds.width));
        let bottom = i64::from(map.height()) - (i64::from(bounds.y) + i64::from(bounds.height));
        if left < 0 || top < 0 || right < 0 || bottom < 0 {
            return Err(GenError::GenerationFailed("room extends past the map border"));
        }
        feature.border_distance = left.min(right).min(top).min(bottom) as u64;
    }

    Ok(features)
}

/// BFS from room 0 through the adjacency graph (or the raw corridor list).
fn populate_graph_depths(map: &Map, features: &mut [RoomFeatures]) -> Result<(), GenError> {
    let room_count = features.len();
    if room_count == 0 {
        return Ok(());
    }

    let use_adjacency = !map.metadata.room_adjacency.is_empty()
        && map.metadata.room_adjacency.len() == room_count;

    features[0].graph_depth = 0;
    let mut queue: Vec<usize> = vec![0];
    let mut head = 0;

    while head < queue.len() {
        let current = queue[head];
        head += 1;
        let current_depth = features[current].graph_depth;

        let mut push_neighbor = |next_room: usize, features: &mut [RoomFeatures], queue: &mut Vec<usize>| {
            if features[next_room].graph_depth == DEPTH_UNREACHABLE {
                features[next_room].graph_depth = current_depth + 1;
                queue.push(next_room);
            }
        };

        if use_adjacency {
            let span = &map.metadata.room_adjacency[current];
            let start = span.start_index as usize;
            let count = span.count as usize;
            if start > map.metadata.room_neighbors.len()
                || count > map.metadata.room_neighbors.len()
                || count > map.metadata.room_neighbors.len() - start
            {
                return Err(GenError::GenerationFailed("adjacency span out of range"));
            }
            for neighbor in &map.metadata.room_neighbors[start..start + count] {
                if neighbor.room_id < 0 || neighbor.room_id as usize >= room_count {
                    return Err(GenError::GenerationFailed("neighbor references invalid room"));
                }
                push_neighbor(neighbor.room_id as usize, features, &mut queue);
            }
        } else {
            for corridor in &map.metadata.corridors {
                let from = corridor.from_room_id;
                let to = corridor.to_room_id;
                if from < 0 || to < 0 || from as usize >= room_count || to as usize >= room_count || from == to {
                    continue;
                }
                if from as usize == current {
                    push_neighbor(to as usize, features, &mut queue);
                } else if to as usize == current {
                    push_neighbor(from as usize, features, &mut queue);
                }
            }
        }
    }

    Ok(())
}

fn room_matches_constraints(feature: &RoomFeatures, definition: &RoomTypeDefinition) -> bool {
    let c = &definition.constraints;
    if !value_in_range(feature.area, c.area_min, c.area_max) {
        return false;
    }
    if !value_in_range(feature.degree, c.degree_min, c.degree_max) {
        return false;
    }
    if !value_in_range(feature.border_distance, c.border_distance_min, c.border_distance_max) {
        return false;
    }
    if feature.graph_depth == DEPTH_UNREACHABLE {
        // Unreachable rooms satisfy only trivial depth constraints.
        c.graph_depth_min <= 0 && c.graph_depth_max == -1
    } else {
        value_in_range(feature.graph_depth, c.graph_depth_min, c.graph_depth_max)
    }
}

fn base_score(feature: &RoomFeatures, definition: &RoomTypeDefinition) -> i64 {
    let p = &definition.preferences;
    i64::from(p.weight) * 1_000_000
        + i64::from(p.larger_room_bias) * feature.area as i64
        + i64::from(p.higher_degree_bias) * feature.degree as i64 * 1_000
        + i64::from(p.border_distance_bias) * feature.border_distance as i64 * 1_000
}

fn type_has_capacity(definition: &RoomTypeDefinition, assigned: u64) -> bool {
    definition.max_count == -1 || assigned < definition.max_count as u64
}

struct AssignmentState<'a> {
    definitions: &'a [RoomTypeDefinition],
    enabled_indices: Vec<usize>,
    /// room-major: eligibility[room * enabled_count + enabled_type]
    eligibility: Vec<bool>,
    eligible_per_type: Vec<u64>,
    eligible_per_room: Vec<u64>,
    assigned_per_type: Vec<u64>,
    room_assignments: Vec<Option<usize>>,
}

impl<'a> AssignmentState<'a> {
    fn enabled_definition(&self, enabled_index: usize) -> &'a RoomTypeDefinition {
        &self.definitions[self.enabled_indices[enabled_index]]
    }
}

/// Highest-scoring unassigned eligible room for a type; ties resolved by a
/// uniform reservoir draw.
fn choose_best_room_for_type(
    rng: &mut Rng,
    features: &[RoomFeatures],
    state: &AssignmentState<'_>,
    enabled_index: usize,
) -> Option<usize> {
    let definition = state.enabled_definition(enabled_index);
    let enabled_count = state.enabled_indices.len();
    let mut best: Option<usize> = None;
    let mut best_score = i64::MIN;
    let mut tie_count: u64 = 0;

    for room_index in 0..features.len() {
        if state.room_assignments[room_index].is_some() {
            continue;
        }
        if !state.eligibility[room_index * enabled_count + enabled_index] {
            continue;
        }

        let mut score = base_score(&features[room_index], definition);
        // Prefer rooms with few alternatives so scarce fits are not wasted.
        if state.eligible_per_room[room_index] > 0 {
            score += 100_000 / state.eligible_per_room[room_index] as i64;
        }

        if best.is_none() || score > best_score {
            best = Some(room_index);
            best_score = score;
            tie_count = 1;
            continue;
        }
        if score == best_score {
            tie_count += 1;
            if u64::from(rng.next_u32()) % tie_count == 0 {
                best = Some(room_index);
            }
        }
    }

    best
}

/// Highest-scoring eligible type with remaining capacity for a room, with
/// below-target and below-minimum bonuses.
fn choose_best_type_for_room(
    rng: &mut Rng,
    features: &[RoomFeatures],
    state: &AssignmentState<'_>,
    room_index: usize,
) -> Option<usize> {
    let enabled_count = state.enabled_indices.len();
    let mut best: Option<usize> = None;
    let mut best_score = i64::MIN;
    let mut tie_count: u64 = 0;

    for enabled_index in 0..enabled_count {
        if !state.eligibility[room_index * enabled_count + enabled_index] {
            continue;
        }
        let definition = state.enabled_definition(enabled_index);
        if !type_has_capacity(definition, state.assigned_per_type[enabled_index]) {
            continue;
        }

        let mut score = base_score(&features[room_index], definition);
        if definition.target_count != -1
            && state.assigned_per_type[enabled_index] < definition.target_count as u64
        {
            score += BELOW_TARGET_BONUS;
        }
        if state.assigned_per_type[enabled_index] < definition.min_count.max(0) as u64 {
            score += BELOW_MIN_BONUS;
        }

        if best.is_none() || score > best_score {
            best = Some(enabled_index);
            best_score = score;
            tie_count = 1;
            continue;
        }
        if score == best_score {
            tie_count += 1;
            if u64::from(rng.next_u32()) % tie_count == 0 {
                best = Some(enabled_index);
            }
        }
    }

    best
}

/// Ascending slack (eligible - min), ties by ascending type id.
fn order_types_by_minimum_slack(state: &AssignmentState<'_>) -> Vec<usize> {
    let mut ordered: Vec<usize> = (0..state.enabled_indices.len()).collect();
    ordered.sort_by(|&a, &b| {
        let da = state.enabled_definition(a);
        let db = state.enabled_definition(b);
        let slack_a = state.eligible_per_type[a] as i64 - i64::from(da.min_count);
        let slack_b = state.eligible_per_type[b] as i64 - i64::from(db.min_count);
        slack_a.cmp(&slack_b).then(da.type_id.cmp(&db.type_id))
    });
    ordered
}

fn strict_feasibility_check(
    request: &GenerateRequest,
    state: &AssignmentState<'_>,
    room_count: usize,
) -> Result<(), GenError> {
    let policy = &request.room_types.policy;
    if policy.strict_mode == 0 {
        return Ok(());
    }

    if state.enabled_indices.is_empty() && policy.allow_untyped_rooms == 0 {
        return Err(GenError::GenerationFailed("no enabled types but untyped rooms disallowed"));
    }

    let mut total_minimum: u64 = 0;
    let mut has_unbounded_max = false;
    let mut total_maximum: u64 = 0;

    for enabled_index in 0..state.enabled_indices.len() {
        let definition = state.enabled_definition(enabled_index);
        if definition.min_count.max(0) as u64 > state.eligible_per_type[enabled_index] {
            return Err(GenError::GenerationFailed("type minimum exceeds its eligible rooms"));
        }
        total_minimum += definition.min_count.max(0) as u64;
        if definition.max_count == -1 {
            has_unbounded_max = true;
        } else {
            total_maximum += definition.max_count as u64;
        }
    }

    if total_minimum > room_count as u64 {
        return Err(GenError::GenerationFailed("type minimums exceed the room count"));
    }

    if policy.allow_untyped_rooms == 0 {
        if state.eligible_per_room.iter().any(|&count| count == 0) {
            return Err(GenError::GenerationFailed("a room is eligible for no enabled type"));
        }
        if !has_unbounded_max && total_maximum < room_count as u64 {
            return Err(GenError::GenerationFailed("bounded maximums cannot cover every room"));
        }
    }

    Ok(())
}

fn write_quota_diagnostics(request: &GenerateRequest, map: &mut Map) {
    map.metadata.diagnostics.clear_room_type_quotas();

    if map.metadata.generation_class != GenerationClass::RoomLike || map.metadata.rooms.is_empty() {
        return;
    }

    for room in &map.metadata.rooms {
        if room.type_id == ROOM_TYPE_UNASSIGNED {
            map.metadata.diagnostics.untyped_room_count += 1;
        } else {
            map.metadata.diagnostics.typed_room_count += 1;
        }
    }

    if request.room_types.definitions.is_empty() {
        return;
    }

    let mut quotas: Vec<RoomTypeQuotaDiagnostics> = request
        .room_types
        .definitions
        .iter()
        .map(|definition| RoomTypeQuotaDiagnostics {
            type_id: definition.type_id,
            enabled: definition.enabled,
            min_count: definition.min_count,
            max_count: definition.max_count,
            target_count: definition.target_count,
            assigned_count: 0,
            min_satisfied: 1,
            max_satisfied: 1,
            target_satisfied: 1,
        })
        .collect();

    for room in &map.metadata.rooms {
        if room.type_id == ROOM_TYPE_UNASSIGNED {
            continue;
        }
        if let Some(quota) = quotas.iter_mut().find(|q| q.type_id == room.type_id) {
            quota.assigned_count += 1;
        }
    }

    for quota in &mut quotas {
        quota.min_satisfied = i32::from(quota.assigned_count >= quota.min_count.max(0) as u64);
        quota.max_satisfied =
            i32::from(quota.max_count == -1 || quota.assigned_count <= quota.max_count as u64);
        quota.target_satisfied =
            i32::from(quota.target_count == -1 || quota.assigned_count == quota.target_count as u64);

        if quota.enabled != 1 {
            continue;
        }
        if quota.min_satisfied == 0 {
            map.metadata.diagnostics.room_type_min_miss_count += 1;
        }
        if quota.max_satisfied == 0 {
            map.metadata.diagnostics.room_type_max_excess_count += 1;
        }
        if quota.target_count != -1 && quota.target_satisfied == 0 {
            map.metadata.diagnostics.room_type_target_miss_count += 1;
        }
    }

    map.metadata.diagnostics.room_type_quotas = quotas;
}

/// Assigns type ids to the map's rooms per the request's definitions and
/// policy. Cave-like maps pass through untouched.
pub fn apply_room_type_assignment(
    request: &GenerateRequest,
    map: &mut Map,
    rng: &mut Rng,
) -> Result<(), GenError> {
    map.metadata.diagnostics.clear_room_type_quotas();

    if map.metadata.generation_class != GenerationClass::RoomLike {
        return Ok(());
    }

    let room_count = map.metadata.rooms.len();
    for room in &mut map.metadata.rooms {
        room.type_id = ROOM_TYPE_UNASSIGNED;
    }

    if request.room_types.definitions.is_empty() || room_count == 0 {
        write_quota_diagnostics(request, map);
        return Ok(());
    }

    let mut features = compute_features(map)?;
    populate_graph_depths(map, &mut features)?;

    let definitions = &request.room_types.definitions;
    let enabled_indices: Vec<usize> = definitions
        .iter()
        .enumerate()
        .filter(|(_, d)| d.enabled == 1)
        .map(|(i, _)| i)
        .collect();

    if enabled_indices.is_empty() {
        return Ok(());
    }

    let enabled_count = enabled_indices.len();
    let mut state = AssignmentState {
        definitions,
        enabled_indices,
        eligibility: vec![false; room_count * enabled_count],
        eligible_per_type: vec![0; enabled_count],
        eligible_per_room: vec![0; room_count],
        assigned_per_type: vec![0; enabled_count],
        room_assignments: vec![None; room_count],
    };

    for room_index in 0..room_count {
        for enabled_index in 0..enabled_count {
            let definition = state.enabled_definition(enabled_index);
            let eligible = room_matches_constraints(&features[room_index], definition);
            state.eligibility[room_index * enabled_count + enabled_index] = eligible;
            if eligible {
                state.eligible_per_type[enabled_index] += 1;
                state.eligible_per_room[room_index] += 1;
            }
        }
    }

    strict_feasibility_check(request, &state, room_count)?;

    // Minimum phase: scarce types claim rooms first.
    for enabled_index in order_types_by_minimum_slack(&state) {
        let min_count = state.enabled_definition(enabled_index).min_count.max(0) as u64;
        while state.assigned_per_type[enabled_index] < min_count {
            let Some(room_index) = choose_best_room_for_type(rng, &features, &state, enabled_index)
            else {
                if request.room_types.policy.strict_mode == 1 {
                    return Err(GenError::GenerationFailed("minimum phase ran out of eligible rooms"));
                }
                break;
            };
            state.room_assignments[room_index] = Some(enabled_index);
            state.assigned_per_type[enabled_index] += 1;
        }
    }

    // Fill phase: remaining rooms in insertion order.
    for room_index in 0..room_count {
        if state.room_assignments[room_index].is_some() {
            continue;
        }
        if let Some(enabled_index) = choose_best_type_for_room(rng, &features, &state, room_index) {
            state.room_assignments[room_index] = Some(enabled_index);
            state.assigned_per_type[enabled_index] += 1;
        }
    }

    // Untyped fallback.
    if request.room_types.policy.allow_untyped_rooms == 0 {
        let default_enabled_index = (0..enabled_count).find(|&enabled_index| {
            state.enabled_definition(enabled_index).type_id == request.room_types.policy.default_type_id
        });

        for room_index in 0..room_count {
            if state.room_assignments[room_index].is_some() {
                continue;
            }
            let Some(default_enabled_index) = default_enabled_index else {
                return Err(GenError::GenerationFailed("no enabled default type for untyped rooms"));
            };
            if request.room_types.policy.strict_mode == 1 {
                return Err(GenError::GenerationFailed("strict mode forbids defaulted rooms"));
            }
            state.room_assignments[room_index] = Some(default_enabled_index);
            state.assigned_per_type[default_enabled_index] += 1;
        }
    }

    // Strict post-conditions.
    if request.room_types.policy.strict_mode == 1 {
        for enabled_index in 0..enabled_count {
            let definition = state.enabled_definition(enabled_index);
            let assigned = state.assigned_per_type[enabled_index];
            if assigned < definition.min_count.max(0) as u64 {
                return Err(GenError::GenerationFailed("type below its minimum after assignment"));
            }
            if definition.max_count != -1 && assigned > definition.max_count as u64 {
                return Err(GenError::GenerationFailed("type above its maximum after assignment"));
            }
        }
    }

    for room_index in 0..room_count {
        map.metadata.rooms[room_index].type_id = match state.room_assignments[room_index] {
            Some(enabled_index) => state.enabled_definition(enabled_index).type_id,
            None => ROOM_TYPE_UNASSIGNED,
        };
    }

    write_quota_diagnostics(request, map);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Rect;
    use crate::map::{Tile, ROOM_FLAG_NONE};
    use crate::request::{Algorithm, RoomTypeDefinition};

    fn room_like_map(rooms: &[Rect]) -> Map {
        let mut map = Map::new(32, 32, Tile::Wall).unwrap();
        map.metadata.generation_class = GenerationClass::RoomLike;
        for bounds in rooms {
            map.add_room(*bounds, ROOM_FLAG_NONE).unwrap();
        }
        map
    }

    fn request_with_types(definitions: Vec<RoomTypeDefinition>) -> GenerateRequest {
        let mut request = GenerateRequest::new(Algorithm::BspTree, 32, 32, 1);
        request.room_types.definitions = definitions;
        request
    }

    #[test]
    fn test_cave_like_maps_are_untouched() {
        let mut map = Map::new(16, 16, Tile::Wall).unwrap();
        map.metadata.generation_class = GenerationClass::CaveLike;
        let request = request_with_types(vec![RoomTypeDefinition::new(1)]);
        apply_room_type_assignment(&request, &mut map, &mut Rng::new(1)).unwrap();
        assert!(map.metadata.diagnostics.room_type_quotas.is_empty());
    }

    #[test]
    fn test_minimums_claim_eligible_rooms() {
        let mut map = room_like_map(&[
            Rect::new(1, 1, 5, 5),
            Rect::new(10, 1, 3, 3),
            Rect::new(1, 10, 3, 3),
        ]);
        let mut definition = RoomTypeDefinition::new(9);
        definition.min_count = 1;
        definition.constraints.area_min = 20;
        let request = request_with_types(vec![definition]);

        apply_room_type_assignment(&request, &mut map, &mut Rng::new(2)).unwrap();
        assert_eq!(map.metadata.rooms[0].type_id, 9);
        assert_eq!(map.metadata.rooms[1].type_id, ROOM_TYPE_UNASSIGNED);
        let quota = &map.metadata.diagnostics.room_type_quotas[0];
        assert_eq!(quota.assigned_count, 1);
        assert_eq!(quota.min_satisfied, 1);
    }

    #[test]
    fn test_strict_mode_rejects_unreachable_minimum() {
        let mut map = room_like_map(&[Rect::new(1, 1, 3, 3)]);
        let mut definition = RoomTypeDefinition::new(1);
        definition.min_count = 2;
        let mut request = request_with_types(vec![definition]);
        request.room_types.policy.strict_mode = 1;

        let result = apply_room_type_assignment(&request, &mut map, &mut Rng::new(3));
        assert!(matches!(result, Err(GenError::GenerationFailed(_))));
    }

    #[test]
    fn test_max_count_caps_fill_phase() {
        let mut map = room_like_map(&[
            Rect::new(1, 1, 3, 3),
            Rect::new(10, 1, 3, 3),
            Rect::new(1, 10, 3, 3),
        ]);
        let mut definition = RoomTypeDefinition::new(4);
        definition.max_count = 2;
        let request = request_with_types(vec![definition]);

        apply_room_type_assignment(&request, &mut map, &mut Rng::new(4)).unwrap();
        let assigned = map
            .metadata
            .rooms
            .iter()
            .filter(|r| r.type_id == 4)
            .count();
        assert_eq!(assigned, 2);
    }

    #[test]
    fn test_default_type_fallback() {
        let mut map = room_like_map(&[Rect::new(1, 1, 3, 3), Rect::new(10, 1, 6, 6)]);
        // Type 2 accepts only large rooms; untyped rooms are disallowed and
        // default to type 7, which accepts anything.
        let mut large_only = RoomTypeDefinition::new(2);
        large_only.constraints.area_min = 30;
        let fallback = RoomTypeDefinition::new(7);
        let mut request = request_with_types(vec![large_only, fallback]);
        request.room_types.policy.allow_untyped_rooms = 0;
        request.room_types.policy.default_type_id = 7;

        apply_room_type_assignment(&request, &mut map, &mut Rng::new(5)).unwrap();
        assert!(map
            .metadata
            .rooms
            .iter()
            .all(|r| r.type_id != ROOM_TYPE_UNASSIGNED));
    }

    #[test]
    fn test_graph_depth_constraint_uses_corridors() {
        let mut map = room_like_map(&[
            Rect::new(1, 1, 3, 3),
            Rect::new(10, 1, 3, 3),
            Rect::new(20, 1, 3, 3),
        ]);
        map.add_corridor(0, 1, 1, 5).unwrap();
        map.add_corridor(1, 2, 1, 5).unwrap();

        // Only rooms at depth >= 2 qualify: just room 2.
        let mut deep_only = RoomTypeDefinition::new(11);
        deep_only.constraints.graph_depth_min = 2;
        let request = request_with_types(vec![deep_only]);

        apply_room_type_assignment(&request, &mut map, &mut Rng::new(6)).unwrap();
        assert_eq!(map.metadata.rooms[2].type_id, 11);
        assert_eq!(map.metadata.rooms[0].type_id, ROOM_TYPE_UNASSIGNED);
        assert_eq!(map.metadata.rooms[1].type_id, ROOM_TYPE_UNASSIGNED);
    }

    #[test]
    fn test_quota_diagnostics_track_misses() {
        let mut map = room_like_map(&[Rect::new(1, 1, 3, 3)]);
        let mut definition = RoomTypeDefinition::new(1);
        definition.min_count = 3;
        // Non-strict: the miss is recorded, not fatal.
        let request = request_with_types(vec![definition]);

        apply_room_type_assignment(&request, &mut map, &mut Rng::new(7)).unwrap();
        assert_eq!(map.metadata.diagnostics.room_type_min_miss_count, 1);
        let quota = &map.metadata.diagnostics.room_type_quotas[0];
        assert_eq!(quota.min_satisfied, 0);
    }
}
