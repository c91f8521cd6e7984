//! Room-template stamping.
//!
//! Rooms whose type carries a template path get a freshly generated sub-map
//! (replayed from the template's request snapshot) resampled into their
//! bounds. Nested templates are rejected, re-entry is guarded by a
//! thread-local depth counter, and detected host-room openings are kept
//! connected through the stamped interior.

use std::cell::Cell;

use tracing::debug;

use crate::error::GenError;
use crate::generate::generate_for_template;
use crate::geometry::{carve_segment, Point, Rect};
use crate::io::load_map;
use crate::map::{
    EdgeOpeningRole, EdgeOpeningSpec, EdgeSide, GenerationClass, Map, RequestSnapshot, Tile,
};
use crate::request::{Algorithm, AssignmentPolicy, GenerateRequest, ProcessConfig, RoomTypesConfig};

thread_local! {
    static TEMPLATE_DEPTH: Cell<u32> = const { Cell::new(0) };
}

const TEMPLATE_GENERATION_ATTEMPTS: i32 = 4;

const SEED_MIX_ROOM: u64 = 11_400_714_819_323_198_485;
const SEED_MIX_ATTEMPT: u64 = 14_029_467_366_897_019_727;

struct DepthGuard;

impl DepthGuard {
    fn enter() -> Result<DepthGuard, GenError> {
        let depth = TEMPLATE_DEPTH.with(|d| d.get());
        if depth > 0 {
            return Err(GenError::GenerationFailed("template stamping is not re-entrant"));
        }
        TEMPLATE_DEPTH.with(|d| d.set(depth + 1));
        Ok(DepthGuard)
    }
}

impl Drop for DepthGuard {
    fn drop(&mut self) {
        TEMPLATE_DEPTH.with(|d| d.set(d.get().saturating_sub(1)));
    }
}

fn validate_loaded_template(template: &Map) -> Result<(), GenError> {
    if template.tile_count() == 0 {
        return Err(GenError::InvalidArgument("template map has no tiles"));
    }
    // A template whose own snapshot stamps templates would recurse.
    if template.metadata.generation_request.present
        && template.metadata.generation_request.references_templates()
    {
        return Err(GenError::GenerationFailed("template map references nested templates"));
    }
    Ok(())
}

fn div_ceil_positive(value: i32, divisor: i32) -> Result<i32, GenError> {
    if value <= 0 || divisor <= 0 {
        return Err(GenError::InvalidArgument("ceil division needs positive operands"));
    }
    let result = (i64::from(value) + i64::from(divisor) - 1) / i64::from(divisor);
    i32::try_from(result).map_err(|_| GenError::GenerationFailed("template dimension overflow"))
}

/// Walkable run detection along one room side; `outside` offsets one tile
/// past the boundary being scanned.
fn collect_side_runs(
    map: &Map,
    room: &Rect,
    side: EdgeSide,
    openings: &mut Vec<EdgeOpeningSpec>,
) {
    let span = match side {
        EdgeSide::Top | EdgeSide::Bottom => room.width,
        EdgeSide::Left | EdgeSide::Right => room.height,
    };

    let mut run_start = -1i32;
    for coord in 0..span {
        let (x, y, ox, oy) = match side {
            EdgeSide::Top => (room.x + coord, room.y, room.x + coord, room.y - 1),
            EdgeSide::Bottom => (
                room.x + coord,
                room.y + room.height - 1,
                room.x + coord,
                room.y + room.height,
            ),
            EdgeSide::Left => (room.x, room.y + coord, room.x - 1, room.y + coord),
            EdgeSide::Right => (
                room.x + room.width - 1,
                room.y + coord,
                room.x + room.width,
                room.y + coord,
            ),
        };

        let open = map.in_bounds(x, y)
            && map.get_tile(x, y).is_walkable()
            && map.in_bounds(ox, oy)
            && !room.contains(ox, oy)
            && !map.point_in_any_room(ox, oy)
            && map.get_tile(ox, oy).is_walkable();

        if open && run_start < 0 {
            run_start = coord;
        }
        if (!open || coord == span - 1) && run_start >= 0 {
            let run_end = if open { coord } else { coord - 1 };
            openings.push(EdgeOpeningSpec {
                side,
                start: run_start,
                end: run_end,
                role: EdgeOpeningRole::None,
            });
            run_start = -1;
        }
    }
}

/// Maximal walkable runs along the room boundary that open into corridors,
/// in side order top, bottom, left, right.
pub(crate) fn collect_room_entrance_openings(map: &Map, room: &Rect) -> Vec<EdgeOpeningSpec> {
    let mut openings = Vec::new();
    if room.width <= 0 || room.height <= 0 {
        return openings;
    }
    collect_side_runs(map, room, EdgeSide::Top, &mut openings);
    collect_side_runs(map, room, EdgeSide::Bottom, &mut openings);
    collect_side_runs(map, room, EdgeSide::Left, &mut openings);
    collect_side_runs(map, room, EdgeSide::Right, &mut openings);
    openings
}

/// Proportionally rescales opening spans from one span length to another,
/// clamping into the target.
pub(crate) fn scale_openings_to_dimensions(
    openings: &[EdgeOpeningSpec],
    source_width: i32,
    source_height: i32,
    target_width: i32,
    target_height: i32,
) -> Vec<EdgeOpeningSpec> {
    openings
        .iter()
        .map(|opening| {
            let (source_span, target_span) = match opening.side {
                EdgeSide::Top | EdgeSide::Bottom => (source_width.max(1), target_width),
                EdgeSide::Left | EdgeSide::Right => (source_height.max(1), target_height),
            };

            let start = opening.start.clamp(0, source_span - 1);
            let end = opening.end.clamp(start, source_span - 1);

            let scaled_start = (i64::from(start) * i64::from(target_span) / i64::from(source_span)) as i32;
            let scaled_end =
                ((i64::from(end + 1) * i64::from(target_span) - 1) / i64::from(source_span)) as i32;

            let scaled_start = scaled_start.clamp(0, target_span - 1);
            let scaled_end = scaled_end.clamp(scaled_start, target_span - 1);

            EdgeOpeningSpec {
                side: opening.side,
                start: scaled_start,
                end: scaled_end,
                role: opening.role,
            }
        })
        .collect()
}

/// Floors the opening run on the border plus one tile inward, returning the
/// anchor tile just inside the midpoint.
pub(crate) fn apply_edge_opening_patch(map: &mut Map, opening: &EdgeOpeningSpec) -> Point {
    let span = match opening.side {
        EdgeSide::Top | EdgeSide::Bottom => map.width(),
        EdgeSide::Left | EdgeSide::Right => map.height(),
    };
    if span <= 0 {
        return Point::new(0, 0);
    }

    let normal = opening.side.inward_normal();
    let start = opening.start.clamp(0, span - 1);
    let end = opening.end.clamp(start, span - 1);

    for coord in start..=end {
        let (x, y) = match opening.side {
            EdgeSide::Top => (coord, 0),
            EdgeSide::Right => (map.width() - 1, coord),
            EdgeSide::Bottom => (coord, map.height() - 1),
            EdgeSide::Left => (0, coord),
        };
        map.set_tile(x, y, Tile::Floor);
        if map.in_bounds(x + normal.x, y + normal.y) {
            map.set_tile(x + normal.x, y + normal.y, Tile::Floor);
        }
    }

    let mid = start + (end - start) / 2;
    let (edge_x, edge_y) = match opening.side {
        EdgeSide::Top => (mid, 0),
        EdgeSide::Right => (map.width() - 1, mid),
        EdgeSide::Bottom => (mid, map.height() - 1),
        EdgeSide::Left => (0, mid),
    };

    let inward = Point::new(edge_x + normal.x, edge_y + normal.y);
    if map.in_bounds(inward.x, inward.y) {
        inward
    } else {
        Point::new(edge_x, edge_y)
    }
}

fn count_walls_on_segment(map: &Map, x0: i32, y0: i32, x1: i32, y1: i32) -> Option<i32> {
    let x_step = (x1 - x0).signum();
    let y_step = (y1 - y0).signum();
    let mut x = x0;
    let mut y = y0;
    let mut count = 0;
    loop {
        if !map.in_bounds(x, y) {
            return None;
        }
        if !map.get_tile(x, y).is_walkable() {
            count += 1;
        }
        if x == x1 && y == y1 {
            return Some(count);
        }
        x += x_step;
        y += y_step;
    }
}

fn count_walls_hv(map: &Map, from: Point, to: Point) -> Option<i32> {
    let horizontal = count_walls_on_segment(map, from.x, from.y, to.x, from.y)?;
    let vertical = count_walls_on_segment(map, to.x, from.y, to.x, to.y)?;
    let corner_counted_twice = !map.get_tile(to.x, from.y).is_walkable();
    Some(horizontal + vertical - i32::from(corner_counted_twice))
}

fn count_walls_vh(map: &Map, from: Point, to: Point) -> Option<i32> {
    let vertical = count_walls_on_segment(map, from.x, from.y, from.x, to.y)?;
    let horizontal = count_walls_on_segment(map, from.x, to.y, to.x, to.y)?;
    let corner_counted_twice = !map.get_tile(from.x, to.y).is_walkable();
    Some(vertical + horizontal - i32::from(corner_counted_twice))
}

/// Carves the L-path (elbow choice by wall count) between two points.
fn carve_low_cost_path(map: &mut Map, from: Point, to: Point) {
    if !map.in_bounds(from.x, from.y) || !map.in_bounds(to.x, to.y) {
        return;
    }
    let cost_hv = count_walls_hv(map, from, to).unwrap_or(i32::MAX);
    let cost_vh = count_walls_vh(map, from, to).unwrap_or(i32::MAX);
    if cost_hv <= cost_vh {
        carve_segment(map, from.x, from.y, to.x, from.y);
        carve_segment(map, to.x, from.y, to.x, to.y);
    } else {
        carve_segment(map, from.x, from.y, from.x, to.y);
        carve_segment(map, from.x, to.y, to.x, to.y);
    }
}

fn walkable_path_exists(map: &Map, start: Point, goal: Point) -> bool {
    if !map.in_bounds(start.x, start.y) || !map.in_bounds(goal.x, goal.y) {
        return false;
    }
    if !map.get_tile(start.x, start.y).is_walkable() || !map.get_tile(goal.x, goal.y).is_walkable() {
        return false;
    }
    if start == goal {
        return true;
    }

    let mut visited = vec![false; map.tile_count()];
    let mut queue = vec![map.tile_index(start.x, start.y)];
    visited[queue[0]] = true;
    let goal_index = map.tile_index(goal.x, goal.y);

    let mut head = 0;
    while head < queue.len() {
        let current = queue[head];
        head += 1;
        let x = (current % map.width() as usize) as i32;
        let y = (current / map.width() as usize) as i32;
        for (dx, dy) in crate::geometry::CARDINALS {
            let nx = x + dx;
            let ny = y + dy;
            if !map.in_bounds(nx, ny) || !map.get_tile(nx, ny).is_walkable() {
                continue;
            }
            let nindex = map.tile_index(nx, ny);
            if visited[nindex] {
                continue;
            }
            if nindex == goal_index {
                return true;
            }
            visited[nindex] = true;
            queue.push(nindex);
        }
    }
    false
}

/// BFS from `start` until any tile that was already walkable in
/// `base_tiles` is reached.
fn walkable_reaches_base_tiles(map: &Map, start: Point, base_tiles: &[Tile]) -> bool {
    if !map.in_bounds(start.x, start.y) || !map.get_tile(start.x, start.y).is_walkable() {
        return false;
    }

    let mut visited = vec![false; map.tile_count()];
    let mut queue = vec![map.tile_index(start.x, start.y)];
    visited[queue[0]] = true;

    let mut head = 0;
    while head < queue.len() {
        let current = queue[head];
        head += 1;
        if base_tiles[current].is_walkable() {
            return true;
        }

        let x = (current % map.width() as usize) as i32;
        let y = (current / map.width() as usize) as i32;
        for (dx, dy) in crate::geometry::CARDINALS {
            let nx = x + dx;
            let ny = y + dy;
            if !map.in_bounds(nx, ny) || !map.get_tile(nx, ny).is_walkable() {
                continue;
            }
            let nindex = map.tile_index(nx, ny);
            if !visited[nindex] {
                visited[nindex] = true;
                queue.push(nindex);
            }
        }
    }
    false
}

fn find_nearest_walkable_in_tiles(map: &Map, tiles: &[Tile], from: Point) -> Option<Point> {
    let mut best: Option<(i32, Point)> = None;
    for (index, tile) in tiles.iter().enumerate() {
        if !tile.is_walkable() {
            continue;
        }
        let x = (index % map.width() as usize) as i32;
        let y = (index / map.width() as usize) as i32;
        let distance = (x - from.x).abs() + (y - from.y).abs();
        if distance == 0 {
            continue;
        }
        match best {
            Some((best_distance, _)) if distance >= best_distance => {}
            _ => best = Some((distance, Point::new(x, y))),
        }
    }
    best.map(|(_, point)| point)
}

fn detect_rooms_and_mazes_parity(map: &Map) -> Option<(i32, i32)> {
    if map.metadata.algorithm_id != Algorithm::RoomsAndMazes as i32 {
        return None;
    }
    map.metadata
        .rooms
        .iter()
        .find(|room| room.bounds.width > 0 && room.bounds.height > 0)
        .map(|room| (room.bounds.x & 1, room.bounds.y & 1))
}

fn align_span_for_parity(start: &mut i32, end: &mut i32, min_coord: i32, max_coord: i32, parity: i32) {
    if min_coord > max_coord {
        return;
    }
    if (*start & 1) != parity {
        if *start > min_coord {
            *start -= 1;
        } else if *end < max_coord {
            *end += 1;
        }
    }
    if ((*end - *start + 1) & 1) == 0 {
        if *end < max_coord {
            *end += 1;
        } else if *start > min_coord {
            *start -= 1;
        }
    }
}

fn build_entrance_rect(
    map: &Map,
    opening: &EdgeOpeningSpec,
    depth: i32,
    parity: Option<(i32, i32)>,
) -> Option<Rect> {
    let (span, max_depth) = match opening.side {
        EdgeSide::Top | EdgeSide::Bottom => (map.width(), map.height()),
        EdgeSide::Left | EdgeSide::Right => (map.height(), map.width()),
    };
    if span <= 0 || max_depth <= 0 {
        return None;
    }

    let mut start = opening.start.clamp(0, span - 1);
    let mut end = opening.end.clamp(start, span - 1);

    if let Some((parity_x, parity_y)) = parity {
        let axis_parity = match opening.side {
            EdgeSide::Top | EdgeSide::Bottom => parity_x,
            EdgeSide::Left | EdgeSide::Right => parity_y,
        };
        align_span_for_parity(&mut start, &mut end, 0, span - 1, axis_parity);
    }

    let mut depth = depth.clamp(1, max_depth);
    if parity.is_some() && depth % 2 == 0 {
        if depth < max_depth {
            depth += 1;
        } else if depth > 1 {
            depth -= 1;
        }
    }

    let rect = match opening.side {
        EdgeSide::Top => Rect::new(start, 0, end - start + 1, depth),
        EdgeSide::Bottom => Rect::new(start, map.height() - depth, end - start + 1, depth),
        EdgeSide::Left => Rect::new(0, start, depth, end - start + 1),
        EdgeSide::Right => Rect::new(map.width() - depth, start, depth, end - start + 1),
    };

    if rect.width <= 0
        || rect.height <= 0
        || rect.x < 0
        || rect.y < 0
        || rect.x + rect.width > map.width()
        || rect.y + rect.height > map.height()
    {
        return None;
    }
    Some(rect)
}

fn rect_touches_walkable(map: &Map, rect: &Rect) -> bool {
    for y in rect.y..rect.y + rect.height {
        for x in rect.x..rect.x + rect.width {
            if !map.in_bounds(x, y) {
                continue;
            }
            if map.get_tile(x, y).is_walkable() {
                return true;
            }
            for (dx, dy) in crate::geometry::CARDINALS {
                let nx = x + dx;
                let ny = y + dy;
                if map.in_bounds(nx, ny)
                    && !rect.contains(nx, ny)
                    && map.get_tile(nx, ny).is_walkable()
                {
                    return true;
                }
            }
        }
    }
    false
}

/// Paints an entrance pocket growing inward from the opening until it
/// touches existing floor; the shallowest connected depth wins.
fn place_entrance_room(map: &mut Map, opening: &EdgeOpeningSpec, parity: Option<(i32, i32)>) {
    let (span, side_depth_limit) = match opening.side {
        EdgeSide::Top | EdgeSide::Bottom => (map.width(), map.height()),
        EdgeSide::Left | EdgeSide::Right => (map.height(), map.width()),
    };
    if span <= 0 || side_depth_limit <= 0 {
        return;
    }

    let start = opening.start.clamp(0, span - 1);
    let end = opening.end.clamp(start, span - 1);
    let length = end - start + 1;
    let mut base_depth = length.clamp(2, 8);
    let max_depth = side_depth_limit.min(base_depth.max(12));
    if base_depth > max_depth {
        base_depth = max_depth;
    }
    if parity.is_some() && base_depth % 2 == 0 {
        if base_depth < max_depth {
            base_depth += 1;
        } else if base_depth > 1 {
            base_depth -= 1;
        }
    }

    let step = if parity.is_some() { 2 } else { 1 };
    let mut fallback: Option<Rect> = None;
    let mut chosen: Option<Rect> = None;

    let mut depth = base_depth;
    while depth <= max_depth {
        if let Some(rect) = build_entrance_rect(map, opening, depth, parity) {
            if fallback.is_none() {
                fallback = Some(rect);
            }
            if rect_touches_walkable(map, &rect) {
                chosen = Some(rect);
                break;
            }
        }
        depth += step;
    }

    if let Some(rect) = chosen.or(fallback) {
        for y in rect.y..rect.y + rect.height {
            for x in rect.x..rect.x + rect.width {
                map.set_tile(x, y, Tile::Floor);
            }
        }
    }
}

/// Re-establishes connectivity between the stamped openings and the
/// generated interior. Room-like templates grow entrance pockets; cave-like
/// templates patch the borders and L-carve between anchors and back to the
/// pre-patch walkable tiles.
pub(crate) fn enforce_opening_connectivity(
    map: &mut Map,
    openings: &[EdgeOpeningSpec],
    use_room_like_entrances: bool,
) {
    if openings.is_empty() {
        return;
    }

    if use_room_like_entrances {
        let parity = detect_rooms_and_mazes_parity(map);
        for opening in openings {
            place_entrance_room(map, opening, parity);
        }
        return;
    }

    let base_tiles = map.tiles().to_vec();
    let anchors: Vec<Point> = openings
        .iter()
        .map(|opening| apply_edge_opening_patch(map, opening))
        .collect();

    for anchor in anchors.iter().skip(1) {
        if !walkable_path_exists(map, anchors[0], *anchor) {
            carve_low_cost_path(map, anchors[0], *anchor);
        }
    }

    for anchor in &anchors {
        if walkable_reaches_base_tiles(map, *anchor, &base_tiles) {
            continue;
        }
        if let Some(target) = find_nearest_walkable_in_tiles(map, &base_tiles, *anchor) {
            if !walkable_path_exists(map, *anchor, target) {
                carve_low_cost_path(map, *anchor, target);
            }
        }
    }
}

fn resample_coordinate_centered(dst_index: i32, dst_span: i32, src_span: i32) -> i32 {
    if dst_span <= 0 || src_span <= 0 {
        return 0;
    }
    if dst_span == src_span {
        return dst_index;
    }
    let numerator = (i64::from(dst_index) * 2 + 1) * i64::from(src_span);
    let denominator = i64::from(dst_span) * 2;
    ((numerator / denominator) as i32).clamp(0, src_span - 1)
}

/// Preserve-walkable-shape resample: centered nearest-neighbor lookup on
/// both axes, writing FLOOR for walkable template tiles and WALL otherwise.
fn apply_template_to_room(map: &mut Map, room: &Rect, template: &Map) -> Result<(), GenError> {
    if room.width <= 0 || room.height <= 0 || template.width() <= 0 || template.height() <= 0 {
        return Err(GenError::InvalidArgument("degenerate stamp target"));
    }

    for local_y in 0..room.height {
        for local_x in 0..room.width {
            let world_x = room.x + local_x;
            let world_y = room.y + local_y;
            if !map.in_bounds(world_x, world_y) {
                continue;
            }
            let source_x = resample_coordinate_centered(local_x, room.width, template.width());
            let source_y = resample_coordinate_centered(local_y, room.height, template.height());
            let tile = if template.get_tile(source_x, source_y).is_walkable() {
                Tile::Floor
            } else {
                Tile::Wall
            };
            map.set_tile(world_x, world_y, tile);
        }
    }
    Ok(())
}

fn build_template_request(
    snapshot: &RequestSnapshot,
    width: i32,
    height: i32,
    seed: u64,
    edge_openings: Vec<EdgeOpeningSpec>,
) -> Result<GenerateRequest, GenError> {
    if !snapshot.present {
        return Err(GenError::InvalidArgument("template map carries no request snapshot"));
    }
    let algorithm = Algorithm::from_i32(snapshot.algorithm_id)
        .ok_or(GenError::UnsupportedFormat("unknown algorithm id in template snapshot"))?;

    let mut request = GenerateRequest::new(algorithm, width, height, seed);
    request.params = snapshot.params;
    request.process = ProcessConfig {
        enabled: i32::from(!snapshot.methods.is_empty()),
        methods: snapshot.methods.clone(),
    };
    request.edge_openings = edge_openings;
    request.room_types = RoomTypesConfig {
        definitions: Vec::new(),
        policy: AssignmentPolicy::default(),
    };
    Ok(request)
}

struct TemplateCacheEntry {
    map: Map,
}

fn stamp_room(
    map: &mut Map,
    room_index: usize,
    template: &Map,
    opening_query: Option<(&crate::map::EdgeOpeningQuery, i32)>,
) -> Result<(), GenError> {
    let room = map.metadata.rooms[room_index];
    let bounds = room.bounds;

    let room_openings = collect_room_entrance_openings(map, &bounds);

    let snapshot = &template.metadata.generation_request;
    let scale_factor = snapshot.process_scale_factor()?;
    let template_width = div_ceil_positive(bounds.width, scale_factor)?;
    let template_height = div_ceil_positive(bounds.height, scale_factor)?;

    let mut generated: Option<Map> = None;
    let mut last_error = GenError::GenerationFailed("template generation budget exhausted");

    for attempt_index in 0..TEMPLATE_GENERATION_ATTEMPTS {
        let mut attempt_width = (template_width + attempt_index).min(bounds.width);
        let mut attempt_height = (template_height + attempt_index).min(bounds.height);
        if scale_factor > 1 {
            attempt_width = attempt_width.min((bounds.width - 1).max(1));
            attempt_height = attempt_height.min((bounds.height - 1).max(1));
        }

        let sub_seed = template.metadata.seed
            ^ ((room.id as u64 + 1).wrapping_mul(SEED_MIX_ROOM))
            ^ ((attempt_index as u64 + 1).wrapping_mul(SEED_MIX_ATTEMPT));

        let scaled_openings = scale_openings_to_dimensions(
            &room_openings,
            bounds.width,
            bounds.height,
            attempt_width,
            attempt_height,
        );

        let template_request =
            build_template_request(snapshot, attempt_width, attempt_height, sub_seed, scaled_openings)?;

        match generate_for_template(&template_request) {
            Ok(sub_map) => {
                generated = Some(sub_map);
                break;
            }
            Err(error) if error.is_retryable() => {
                debug!(room = room.id, attempt = attempt_index, "template generation retry");
                last_error = error;
            }
            Err(error) => return Err(error),
        }
    }

    let mut generated = generated.ok_or(last_error)?;

    if let Some((query, required_matches)) = opening_query {
        if required_matches > 0 {
            let matches = generated.query_edge_openings(query).len();
            if matches < required_matches as usize {
                return Err(GenError::GenerationFailed("template opening query unsatisfied"));
            }
        }
    }

    let connectivity_openings = scale_openings_to_dimensions(
        &room_openings,
        bounds.width,
        bounds.height,
        generated.width(),
        generated.height(),
    );

    let use_room_like = generated.metadata.generation_class == GenerationClass::RoomLike;
    // Rooms-and-mazes sub-generation already carves its openings; adding
    // entrance pockets after the fact would punch extra holes.
    if generated.metadata.algorithm_id != Algorithm::RoomsAndMazes as i32 {
        enforce_opening_connectivity(&mut generated, &connectivity_openings, use_room_like);
    }

    apply_template_to_room(map, &bounds, &generated)?;

    // Restore the detected opening tiles so corridors still meet the room.
    for spec in &room_openings {
        let span_len = match spec.side {
            EdgeSide::Top | EdgeSide::Bottom => bounds.width,
            EdgeSide::Left | EdgeSide::Right => bounds.height,
        };
        let start = spec.start.clamp(0, span_len - 1);
        let end = spec.end.clamp(start, span_len - 1);
        for coord in start..=end {
            let (x, y) = match spec.side {
                EdgeSide::Top => (bounds.x + coord, bounds.y),
                EdgeSide::Bottom => (bounds.x + coord, bounds.y + bounds.height - 1),
                EdgeSide::Left => (bounds.x, bounds.y + coord),
                EdgeSide::Right => (bounds.x + bounds.width - 1, bounds.y + coord),
            };
            map.set_tile(x, y, Tile::Floor);
        }
    }

    Ok(())
}

/// Stamps templates into every room whose type (or untyped fallback policy)
/// configures one. No-op when nothing is configured.
pub fn apply_room_type_templates(request: &GenerateRequest, map: &mut Map) -> Result<(), GenError> {
    if map.metadata.generation_class != GenerationClass::RoomLike || map.metadata.rooms.is_empty() {
        return Ok(());
    }

    let has_untyped_template = !request.room_types.policy.untyped_template_map_path.is_empty();
    let has_any = has_untyped_template
        || request
            .room_types
            .definitions
            .iter()
            .any(|definition| !definition.template_map_path.is_empty());
    if !has_any {
        return Ok(());
    }

    let _guard = DepthGuard::enter()?;

    let mut cache: Vec<Option<TemplateCacheEntry>> =
        Vec::with_capacity(request.room_types.definitions.len() + 1);
    for definition in &request.room_types.definitions {
        if definition.template_map_path.is_empty() {
            cache.push(None);
            continue;
        }
        let template = load_map(&definition.template_map_path)?;
        validate_loaded_template(&template)?;
        cache.push(Some(TemplateCacheEntry { map: template }));
    }

    let untyped_entry = if has_untyped_template {
        let template = load_map(&request.room_types.policy.untyped_template_map_path)?;
        validate_loaded_template(&template)?;
        Some(TemplateCacheEntry { map: template })
    } else {
        None
    };

    for room_index in 0..map.metadata.rooms.len() {
        let type_id = map.metadata.rooms[room_index].type_id;

        if type_id == crate::map::ROOM_TYPE_UNASSIGNED {
            if let Some(entry) = &untyped_entry {
                stamp_room(map, room_index, &entry.map, None)?;
            }
            continue;
        }

        let Some(definition_index) = request
            .room_types
            .definitions
            .iter()
            .position(|definition| definition.type_id == type_id)
        else {
            continue;
        };
        let Some(entry) = &cache[definition_index] else {
            continue;
        };

        let definition = &request.room_types.definitions[definition_index];
        stamp_room(
            map,
            room_index,
            &entry.map,
            Some((
                &definition.template_opening_query,
                definition.template_required_opening_matches,
            )),
        )?;
    }

    Ok(())
}
