//! Post-process pipeline.
//!
//! An ordered list of deterministic transforms applied to the finished base
//! map: integer scaling, per-room shape carving, corridor path smoothing
//! (inner corner fill, outer corner trim), and corridor roughening. Each
//! step records before/after connectivity diagnostics; a failing step clears
//! the whole diagnostics buffer so no torn record is observable.

use crate::connectivity::analyze_top_down_connectivity;
use crate::error::GenError;
use crate::geometry::{Point, Rect};
use crate::map::{GenerationClass, Map, ProcessStepDiagnostics, Tile};
use crate::request::{CorridorRoughenMode, GenerateRequest, ProcessMethod, RoomShapeMode};
use crate::rng::Rng;

/// Detection priority for entrance normals: north, east, south, west.
const ENTRANCE_DIRS: [(i32, i32); 4] = [(0, -1), (1, 0), (0, 1), (-1, 0)];

const CARDINALS: [(i32, i32); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];

fn is_corridor_floor(map: &Map, x: i32, y: i32) -> bool {
    map.in_bounds(x, y) && map.get_tile(x, y).is_walkable() && !map.point_in_any_room(x, y)
}

fn is_corridor_floor_in(map: &Map, tiles: &[Tile], x: i32, y: i32) -> bool {
    map.in_bounds(x, y)
        && tiles[map.tile_index(x, y)].is_walkable()
        && !map.point_in_any_room(x, y)
}

fn corridor_touches_room(map: &Map, x: i32, y: i32) -> bool {
    if !is_corridor_floor(map, x, y) {
        return false;
    }
    CARDINALS.iter().any(|(dx, dy)| {
        let nx = x + dx;
        let ny = y + dy;
        map.point_in_any_room(nx, ny) && map.get_tile(nx, ny).is_walkable()
    })
}

fn corridor_touches_room_in(map: &Map, tiles: &[Tile], x: i32, y: i32) -> bool {
    if !is_corridor_floor_in(map, tiles, x, y) {
        return false;
    }
    CARDINALS.iter().any(|(dx, dy)| {
        let nx = x + dx;
        let ny = y + dy;
        map.in_bounds(nx, ny)
            && map.point_in_any_room(nx, ny)
            && tiles[map.tile_index(nx, ny)].is_walkable()
    })
}

// ---------------------------------------------------------------------------
// SCALE
// ---------------------------------------------------------------------------

fn mul_i32_checked(value: i32, factor: i32) -> Option<i32> {
    value.checked_mul(factor).filter(|v| *v >= 0)
}

fn scale_map(map: &mut Map, factor: i32) -> Result<(), GenError> {
    if factor < 1 {
        return Err(GenError::InvalidArgument("scale factor below 1"));
    }
    if factor == 1 {
        return Ok(());
    }

    for room in &mut map.metadata.rooms {
        room.bounds = Rect::new(
            mul_i32_checked(room.bounds.x, factor)
                .ok_or(GenError::GenerationFailed("room position overflow under scale"))?,
            mul_i32_checked(room.bounds.y, factor)
                .ok_or(GenError::GenerationFailed("room position overflow under scale"))?,
            mul_i32_checked(room.bounds.width, factor)
                .ok_or(GenError::GenerationFailed("room extent overflow under scale"))?,
            mul_i32_checked(room.bounds.height, factor)
                .ok_or(GenError::GenerationFailed("room extent overflow under scale"))?,
        );
    }
    for corridor in &mut map.metadata.corridors {
        corridor.width = mul_i32_checked(corridor.width, factor)
            .ok_or(GenError::GenerationFailed("corridor width overflow under scale"))?;
        corridor.length = mul_i32_checked(corridor.length, factor)
            .ok_or(GenError::GenerationFailed("corridor length overflow under scale"))?;
    }

    let new_width = mul_i32_checked(map.width(), factor)
        .ok_or(GenError::GenerationFailed("map width overflow under scale"))?;
    let new_height = mul_i32_checked(map.height(), factor)
        .ok_or(GenError::GenerationFailed("map height overflow under scale"))?;
    let new_cell_count = (new_width as u64)
        .checked_mul(new_height as u64)
        .filter(|&count| count <= usize::MAX as u64)
        .ok_or(GenError::AllocationFailed("scaled tile count overflow"))?;

    let mut scaled = vec![Tile::Wall; new_cell_count as usize];
    for y in 0..map.height() {
        for x in 0..map.width() {
            let tile = map.get_tile(x, y);
            for dy in 0..factor {
                let sy = y * factor + dy;
                for dx in 0..factor {
                    let sx = x * factor + dx;
                    scaled[sy as usize * new_width as usize + sx as usize] = tile;
                }
            }
        }
    }

    map.replace_tiles(new_width, new_height, scaled);
    Ok(())
}

// ---------------------------------------------------------------------------
// ROOM_SHAPE
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
struct EntrancePoint {
    point: Point,
    inward_x: i32,
    inward_y: i32,
}

/// Clusters walkable boundary tiles that open into corridors, one
/// representative per cluster, preferring tiles close to the room center.
fn collect_room_entrances(map: &Map, room: &Rect) -> Vec<EntrancePoint> {
    let room_area = room.width as usize * room.height as usize;
    let mut candidate_mask = vec![false; room_area];
    let mut candidate_normal = vec![(0i32, 0i32); room_area];

    for local_y in 0..room.height {
        for local_x in 0..room.width {
            let x = room.x + local_x;
            let y = room.y + local_y;
            if !map.get_tile(x, y).is_walkable() {
                continue;
            }
            for (dx, dy) in ENTRANCE_DIRS {
                let nx = x + dx;
                let ny = y + dy;
                if !map.in_bounds(nx, ny) {
                    continue;
                }
                if room.contains(nx, ny) || map.point_in_any_room(nx, ny) {
                    continue;
                }
                if !map.get_tile(nx, ny).is_walkable() {
                    continue;
                }
                let index = local_y as usize * room.width as usize + local_x as usize;
                candidate_mask[index] = true;
                candidate_normal[index] = (dx, dy);
                break;
            }
        }
    }

    let center = room.center();
    let mut entrances: Vec<EntrancePoint> = Vec::new();
    let mut queue: Vec<usize> = Vec::new();

    for seed in 0..room_area {
        if !candidate_mask[seed] {
            continue;
        }
        candidate_mask[seed] = false;
        queue.clear();
        queue.push(seed);

        let seed_x = room.x + (seed % room.width as usize) as i32;
        let seed_y = room.y + (seed / room.width as usize) as i32;
        let mut best = EntrancePoint {
            point: Point::new(seed_x, seed_y),
            inward_x: -candidate_normal[seed].0,
            inward_y: -candidate_normal[seed].1,
        };
        let mut best_metric = (seed_x - center.x).abs() + (seed_y - center.y).abs();

        let mut head = 0;
        while head < queue.len() {
            let node = queue[head];
            head += 1;
            let cx = (node % room.width as usize) as i32;
            let cy = (node / room.width as usize) as i32;
            let gx = room.x + cx;
            let gy = room.y + cy;
            let metric = (gx - center.x).abs() + (gy - center.y).abs();

            if metric < best_metric
                || (metric == best_metric
                    && (gy < best.point.y || (gy == best.point.y && gx < best.point.x)))
            {
                best = EntrancePoint {
                    point: Point::new(gx, gy),
                    inward_x: -candidate_normal[node].0,
                    inward_y: -candidate_normal[node].1,
                };
                best_metric = metric;
            }

            for (dx, dy) in ENTRANCE_DIRS {
                let nx = cx + dx;
                let ny = cy + dy;
                if nx < 0 || ny < 0 || nx >= room.width || ny >= room.height {
                    continue;
                }
                let neighbor = ny as usize * room.width as usize + nx as usize;
                if !candidate_mask[neighbor] {
                    continue;
                }
                candidate_mask[neighbor] = false;
                queue.push(neighbor);
            }
        }

        entrances.push(best);
    }

    entrances
}

fn hash_mix_u32(mut value: u32) -> u32 {
    value ^= value >> 16;
    value = value.wrapping_mul(0x7feb_352d);
    value ^= value >> 15;
    value = value.wrapping_mul(0x846c_a68b);
    value ^= value >> 16;
    value
}

fn hash_noise_coords(seed: u32, x: i32, y: i32) -> u32 {
    let value = seed
        ^ (x as u32).wrapping_mul(0x1f12_3bb5)
        ^ (y as u32).wrapping_mul(0x5f35_6495);
    hash_mix_u32(value)
}

fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

fn value_noise_2d(seed: u32, x: i32, y: i32, cell_size: i32) -> f64 {
    let cell_size = cell_size.max(1);
    let gx = x / cell_size;
    let gy = y / cell_size;
    let tx = f64::from(x % cell_size) / f64::from(cell_size);
    let ty = f64::from(y % cell_size) / f64::from(cell_size);

    let corner = |cx: i32, cy: i32| {
        f64::from(hash_noise_coords(seed, cx, cy) & 0x00ff_ffff) / 16_777_215.0
    };

    let vx0 = lerp(corner(gx, gy), corner(gx + 1, gy), tx);
    let vx1 = lerp(corner(gx, gy + 1), corner(gx + 1, gy + 1), tx);
    lerp(vx0, vx1, ty)
}

fn fbm_noise_2d(seed: u32, x: i32, y: i32, base_cell_size: i32, octaves: i32) -> f64 {
    let base_cell_size = base_cell_size.max(1);
    let octaves = octaves.max(1);

    let mut value = 0.0;
    let mut amplitude = 1.0;
    let mut amplitude_sum = 0.0;
    for octave in 0..octaves {
        let cell_size = (base_cell_size >> octave).max(1);
        value += value_noise_2d(seed.wrapping_add((octave * 92821) as u32), x, y, cell_size) * amplitude;
        amplitude_sum += amplitude;
        amplitude *= 0.55;
    }

    if amplitude_sum <= 0.0 {
        return 0.0;
    }
    value / amplitude_sum
}

fn build_organic_keep_mask(room: &Rect, organicity: i32, rng: &mut Rng) -> Vec<bool> {
    let strength = f64::from(organicity.clamp(0, 100)) / 100.0;
    let cx = (f64::from(room.width) - 1.0) * 0.5;
    let cy = (f64::from(room.height) - 1.0) * 0.5;
    let rx = f64::from((room.width - 1).max(1)) * 0.5;
    let ry = f64::from((room.height - 1).max(1)) * 0.5;
    let noise_seed = rng.next_u32();
    let base_cell = (room.width.min(room.height) / 2).clamp(2, 12);

    let mut keep = vec![false; room.width as usize * room.height as usize];
    for y in 0..room.height {
        for x in 0..room.width {
            let nx = (f64::from(x) - cx) / rx;
            let ny = (f64::from(y) - cy) / ry;
            let ellipse = nx * nx + ny * ny;
            let noise = fbm_noise_2d(noise_seed, x, y, base_cell, 3);
            let perturbation = (noise - 0.5) * (0.25 + 0.55 * strength);
            let threshold = 1.0 - 0.08 * strength;
            if ellipse + perturbation <= threshold {
                keep[y as usize * room.width as usize + x as usize] = true;
            }
        }
    }
    keep
}

fn build_cellular_keep_mask(room: &Rect, organicity: i32, rng: &mut Rng) -> Vec<bool> {
    let width = room.width as usize;
    let strength = f64::from(organicity.clamp(0, 100)) / 100.0;
    let cx = (f64::from(room.width) - 1.0) * 0.5;
    let cy = (f64::from(room.height) - 1.0) * 0.5;
    let rx = f64::from((room.width - 1).max(1)) * 0.5;
    let ry = f64::from((room.height - 1).max(1)) * 0.5;

    let ellipse_at = |x: i32, y: i32| {
        let nx = (f64::from(x) - cx) / rx;
        let ny = (f64::from(y) - cy) / ry;
        nx * nx + ny * ny
    };

    let mut current = vec![false; width * room.height as usize];
    for y in 0..room.height {
        for x in 0..room.width {
            let base_open = 68 - (strength * 24.0) as i32;
            let center_bonus = ((1.2 - ellipse_at(x, y)) * 22.0) as i32;
            let chance = (base_open + center_bonus + rng.range(-12, 12)).clamp(8, 95);
            current[y as usize * width + x as usize] = rng.range(0, 99) < chance;
        }
    }

    let steps = 2 + organicity.clamp(0, 100) / 30;
    let mut next = vec![false; current.len()];
    for _ in 0..steps {
        for y in 0..room.height {
            for x in 0..room.width {
                let mut neighbors = 0;
                for dy in -1..=1 {
                    for dx in -1..=1i32 {
                        if dx == 0 && dy == 0 {
                            continue;
                        }
                        let sx = x + dx;
                        let sy = y + dy;
                        if sx < 0 || sy < 0 || sx >= room.width || sy >= room.height {
                            continue;
                        }
                        if current[sy as usize * width + sx as usize] {
                            neighbors += 1;
                        }
                    }
                }

                let index = y as usize * width + x as usize;
                next[index] = if ellipse_at(x, y) < 0.16 {
                    true
                } else if current[index] {
                    neighbors >= 3
                } else {
                    neighbors >= 5
                };
            }
        }
        std::mem::swap(&mut current, &mut next);
    }
    current
}

fn build_chamfer_keep_mask(room: &Rect, organicity: i32) -> Vec<bool> {
    let width = room.width as usize;
    let mut keep = vec![true; width * room.height as usize];
    if room.width < 3 || room.height < 3 {
        return keep;
    }

    let radius_max = room.width.min(room.height) / 3;
    if radius_max < 1 {
        return keep;
    }
    let mut radius = organicity.clamp(0, 100) * radius_max / 100;
    if radius == 0 && organicity > 0 {
        radius = 1;
    }
    if radius < 1 {
        return keep;
    }

    let radius_sq = radius * radius;
    for y in 0..room.height {
        for x in 0..room.width {
            let local_x = if x < radius {
                Some(radius - x)
            } else if x >= room.width - radius {
                Some(radius - ((room.width - 1) - x))
            } else {
                None
            };
            let local_y = if y < radius {
                Some(radius - y)
            } else if y >= room.height - radius {
                Some(radius - ((room.height - 1) - y))
            } else {
                None
            };

            if let (Some(dx), Some(dy)) = (local_x, local_y) {
                if dx * dx + dy * dy > radius_sq {
                    keep[y as usize * width + x as usize] = false;
                }
            }
        }
    }
    keep
}

fn apply_keep_mask(map: &mut Map, room: &Rect, keep: &[bool], entrances: &[EntrancePoint]) {
    for y in room.y..room.y + room.height {
        for x in room.x..room.x + room.width {
            map.set_tile(x, y, Tile::Wall);
        }
    }
    for y in 0..room.height {
        for x in 0..room.width {
            if keep[y as usize * room.width as usize + x as usize] {
                map.set_tile(room.x + x, room.y + y, Tile::Floor);
            }
        }
    }

    // Guarantee a walkable interior anchor, falling back to the kept tile
    // nearest the geometric center.
    let mut anchor = room.center();
    if !map.get_tile(anchor.x, anchor.y).is_walkable() {
        let mut best_dist = i32::MAX;
        let mut found = false;
        for y in 0..room.height {
            for x in 0..room.width {
                if !keep[y as usize * room.width as usize + x as usize] {
                    continue;
                }
                let tx = room.x + x;
                let ty = room.y + y;
                let dist = (anchor.x - tx).abs() + (anchor.y - ty).abs();
                if !found || dist < best_dist {
                    anchor = Point::new(tx, ty);
                    best_dist = dist;
                    found = true;
                }
            }
        }
    }
    map.set_tile(anchor.x, anchor.y, Tile::Floor);

    for entrance in entrances {
        map.set_tile(entrance.point.x, entrance.point.y, Tile::Floor);

        let depth = 2.min(1.max(room.width.min(room.height) / 2));
        for step in 1..=depth {
            let tx = entrance.point.x + entrance.inward_x * step;
            let ty = entrance.point.y + entrance.inward_y * step;
            if !room.contains(tx, ty) {
                break;
            }
            map.set_tile(tx, ty, Tile::Floor);

            if step == 1 {
                let lateral_x = if entrance.inward_x != 0 { 0 } else { 1 };
                let lateral_y = if entrance.inward_y != 0 { 0 } else { 1 };
                for side in [-1, 1] {
                    let sx = tx + lateral_x * side;
                    let sy = ty + lateral_y * side;
                    if room.contains(sx, sy) {
                        map.set_tile(sx, sy, Tile::Floor);
                    }
                }
            }
        }

        // Straight carves re-connect the entrance to the anchor.
        let mut sx = entrance.point.x;
        let mut sy = entrance.point.y;
        while sx != anchor.x {
            sx += if anchor.x > sx { 1 } else { -1 };
            if room.contains(sx, sy) {
                map.set_tile(sx, sy, Tile::Floor);
            }
        }
        while sy != anchor.y {
            sy += if anchor.y > sy { 1 } else { -1 };
            if room.contains(sx, sy) {
                map.set_tile(sx, sy, Tile::Floor);
            }
        }
    }
}

fn apply_room_shapes(
    map: &mut Map,
    mode: RoomShapeMode,
    organicity: i32,
    rng: &mut Rng,
) -> Result<(), GenError> {
    if mode == RoomShapeMode::Rectangular || map.metadata.rooms.is_empty() {
        return Ok(());
    }

    let rooms: Vec<Rect> = map.metadata.rooms.iter().map(|r| r.bounds).collect();
    for room in &rooms {
        if room.width <= 0 || room.height <= 0 {
            return Err(GenError::InvalidArgument("degenerate room bounds"));
        }
        let entrances = collect_room_entrances(map, room);
        let keep = match mode {
            RoomShapeMode::Rectangular => continue,
            RoomShapeMode::Organic => build_organic_keep_mask(room, organicity, rng),
            RoomShapeMode::Cellular => build_cellular_keep_mask(room, organicity, rng),
            RoomShapeMode::Chamfered => build_chamfer_keep_mask(room, organicity),
        };
        apply_keep_mask(map, room, &keep, &entrances);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// PATH_SMOOTH
// ---------------------------------------------------------------------------

/// BFS over corridor tiles with one cell blocked, reusing caller scratch.
#[allow(clippy::too_many_arguments)]
fn has_corridor_path_when_blocked(
    map: &Map,
    tiles: &[Tile],
    start: (i32, i32),
    target: (i32, i32),
    blocked: (i32, i32),
    visited: &mut [bool],
    queue: &mut Vec<usize>,
) -> bool {
    if !is_corridor_floor_in(map, tiles, start.0, start.1)
        || !is_corridor_floor_in(map, tiles, target.0, target.1)
    {
        return false;
    }
    if start == target {
        return true;
    }

    visited.fill(false);
    queue.clear();
    queue.push(map.tile_index(start.0, start.1));
    visited[map.tile_index(start.0, start.1)] = true;

    let mut head = 0;
    while head < queue.len() {
        let current = queue[head];
        head += 1;
        let x = (current % map.width() as usize) as i32;
        let y = (current / map.width() as usize) as i32;

        for (dx, dy) in CARDINALS {
            let nx = x + dx;
            let ny = y + dy;
            if !map.in_bounds(nx, ny) || (nx, ny) == blocked {
                continue;
            }
            if !is_corridor_floor_in(map, tiles, nx, ny) {
                continue;
            }
            let nindex = map.tile_index(nx, ny);
            if visited[nindex] {
                continue;
            }
            if (nx, ny) == target {
                return true;
            }
            visited[nindex] = true;
            queue.push(nindex);
        }
    }
    false
}

/// Inner pass fills concave 90-degree corridor corners; outer pass trims
/// convex corners when a bridge preserves the path. Inner-added bridges are
/// protected from subsequent outer trims, and corners that terminate into
/// rooms are never touched.
fn smooth_paths(map: &mut Map, strength: i32, inner_enabled: i32, outer_enabled: i32) {
    if strength <= 0 || (inner_enabled == 0 && outer_enabled == 0) {
        return;
    }

    let cell_count = map.tile_count();
    let width = map.width();
    let height = map.height();
    let source_tiles = map.tiles().to_vec();

    if inner_enabled != 0 {
        for _ in 0..strength {
            let mut buffer = map.tiles().to_vec();
            for y in 1..height - 1 {
                for x in 1..width - 1 {
                    let index = map.tile_index(x, y);
                    if map.tiles()[index] != Tile::Wall || map.point_in_any_room(x, y) {
                        continue;
                    }

                    // Do not open extra room entrances while smoothing.
                    let opens_room = ENTRANCE_DIRS.iter().any(|(dx, dy)| {
                        map.point_in_any_room(x + dx, y + dy)
                            && map.get_tile(x + dx, y + dy).is_walkable()
                    });
                    if opens_room {
                        continue;
                    }

                    let n = is_corridor_floor(map, x, y - 1);
                    let e = is_corridor_floor(map, x + 1, y);
                    let s = is_corridor_floor(map, x, y + 1);
                    let w = is_corridor_floor(map, x - 1, y);

                    let legs = if n && e && !s && !w {
                        Some(((x, y - 1), (x + 1, y)))
                    } else if e && s && !n && !w {
                        Some(((x + 1, y), (x, y + 1)))
                    } else if s && w && !n && !e {
                        Some(((x, y + 1), (x - 1, y)))
                    } else if w && n && !s && !e {
                        Some(((x - 1, y), (x, y - 1)))
                    } else {
                        None
                    };

                    let Some((leg_a, leg_b)) = legs else { continue };
                    if corridor_touches_room(map, leg_a.0, leg_a.1)
                        || corridor_touches_room(map, leg_b.0, leg_b.1)
                    {
                        continue;
                    }
                    buffer[index] = Tile::Floor;
                }
            }
            map.replace_tiles(width, height, buffer);
        }
    }

    if outer_enabled != 0 {
        // Tiles the inner pass added must survive outer trimming.
        let mut protected = vec![false; cell_count];
        if inner_enabled != 0 {
            for index in 0..cell_count {
                if source_tiles[index] != Tile::Wall || !map.tiles()[index].is_walkable() {
                    continue;
                }
                let x = (index % width as usize) as i32;
                let y = (index / width as usize) as i32;
                if map.point_in_any_room(x, y) {
                    continue;
                }
                protected[index] = true;
            }
        }

        let mut visited = vec![false; cell_count];
        let mut queue: Vec<usize> = Vec::with_capacity(cell_count);

        for _ in 0..strength {
            let pass_source = map.tiles().to_vec();
            let mut buffer = map.tiles().to_vec();

            for y in 1..height - 1 {
                for x in 1..width - 1 {
                    let index = map.tile_index(x, y);
                    if !is_corridor_floor(map, x, y) || protected[index] {
                        continue;
                    }
                    if !is_corridor_floor_in(map, &pass_source, x, y) {
                        continue;
                    }

                    let n = is_corridor_floor_in(map, &pass_source, x, y - 1);
                    let e = is_corridor_floor_in(map, &pass_source, x + 1, y);
                    let s = is_corridor_floor_in(map, &pass_source, x, y + 1);
                    let w = is_corridor_floor_in(map, &pass_source, x - 1, y);

                    let candidate = if n && e && !s && !w {
                        Some(((x + 1, y - 1), (x - 1, y + 1), (x, y - 1), (x + 1, y)))
                    } else if e && s && !n && !w {
                        Some(((x + 1, y + 1), (x - 1, y - 1), (x + 1, y), (x, y + 1)))
                    } else if s && w && !n && !e {
                        Some(((x - 1, y + 1), (x + 1, y - 1), (x, y + 1), (x - 1, y)))
                    } else if w && n && !s && !e {
                        Some(((x - 1, y - 1), (x + 1, y + 1), (x - 1, y), (x, y - 1)))
                    } else {
                        None
                    };

                    let Some((bridge, opposite, leg_a, leg_b)) = candidate else {
                        continue;
                    };

                    if !map.in_bounds(bridge.0, bridge.1) || map.point_in_any_room(bridge.0, bridge.1) {
                        continue;
                    }
                    if corridor_touches_room_in(map, &pass_source, x, y)
                        || corridor_touches_room_in(map, &pass_source, leg_a.0, leg_a.1)
                        || corridor_touches_room_in(map, &pass_source, leg_b.0, leg_b.1)
                    {
                        continue;
                    }
                    if !is_corridor_floor(map, bridge.0, bridge.1)
                        || is_corridor_floor(map, opposite.0, opposite.1)
                    {
                        continue;
                    }

                    // Cascading trims must not sever the bend: both legs and
                    // the bridge must still be present in the output buffer.
                    if !is_corridor_floor_in(map, &buffer, leg_a.0, leg_a.1)
                        || !is_corridor_floor_in(map, &buffer, leg_b.0, leg_b.1)
                        || !is_corridor_floor_in(map, &buffer, bridge.0, bridge.1)
                        || is_corridor_floor_in(map, &buffer, opposite.0, opposite.1)
                    {
                        continue;
                    }
                    if !has_corridor_path_when_blocked(
                        map,
                        &buffer,
                        leg_a,
                        leg_b,
                        (x, y),
                        &mut visited,
                        &mut queue,
                    ) {
                        continue;
                    }

                    buffer[index] = Tile::Wall;
                }
            }

            map.replace_tiles(width, height, buffer);
        }
    }
}

// ---------------------------------------------------------------------------
// CORRIDOR_ROUGHEN
// ---------------------------------------------------------------------------

fn is_corridor_border_wall(map: &Map, x: i32, y: i32) -> bool {
    if map.get_tile(x, y) != Tile::Wall || map.point_in_any_room(x, y) {
        return false;
    }
    CARDINALS
        .iter()
        .any(|(dx, dy)| is_corridor_floor(map, x + dx, y + dy))
}

fn roughen_pass(
    map: &mut Map,
    strength: i32,
    mode: CorridorRoughenMode,
    rng: &mut Rng,
) -> u64 {
    if strength == 0 || map.width() < 3 || map.height() < 3 {
        return 0;
    }

    let cell_count = map.tile_count();
    let mut candidate = vec![false; cell_count];
    let mut candidate_count = 0u64;
    for y in 1..map.height() - 1 {
        for x in 1..map.width() - 1 {
            if is_corridor_border_wall(map, x, y) {
                candidate[map.tile_index(x, y)] = true;
                candidate_count += 1;
            }
        }
    }
    if candidate_count == 0 {
        return 0;
    }

    let mut carved = 0u64;
    match mode {
        CorridorRoughenMode::Uniform => {
            for y in 1..map.height() - 1 {
                for x in 1..map.width() - 1 {
                    let index = map.tile_index(x, y);
                    if !candidate[index] {
                        continue;
                    }
                    if rng.range(0, 99) < strength {
                        map.set_tile_at(index, Tile::Floor);
                        carved += 1;
                    }
                }
            }
        }
        CorridorRoughenMode::Organic => {
            let mut field = vec![0i32; cell_count];
            for y in 1..map.height() - 1 {
                for x in 1..map.width() - 1 {
                    let index = map.tile_index(x, y);
                    if candidate[index] {
                        field[index] = rng.range(0, 100);
                    }
                }
            }

            for y in 1..map.height() - 1 {
                for x in 1..map.width() - 1 {
                    let index = map.tile_index(x, y);
                    if !candidate[index] {
                        continue;
                    }

                    // 3x-weighted center smoothed against candidate neighbors.
                    let mut sum = field[index] * 3;
                    let mut weight = 3;
                    for dy in -1..=1 {
                        for dx in -1..=1i32 {
                            if dx == 0 && dy == 0 {
                                continue;
                            }
                            let nindex = map.tile_index(x + dx, y + dy);
                            if candidate[nindex] {
                                sum += field[nindex];
                                weight += 1;
                            }
                        }
                    }

                    let corridor_neighbors = CARDINALS
                        .iter()
                        .filter(|&&(dx, dy)| is_corridor_floor(map, x + dx, y + dy))
                        .count() as i32;

                    let averaged = sum / weight;
                    let threshold =
                        (strength + corridor_neighbors * 8 + rng.range(-8, 8)).clamp(0, 100);
                    if averaged <= threshold {
                        map.set_tile_at(index, Tile::Floor);
                        carved += 1;
                    }
                }
            }
        }
    }

    carved
}

fn roughen_corridors(
    map: &mut Map,
    strength: i32,
    max_depth: i32,
    mode: CorridorRoughenMode,
    rng: &mut Rng,
) -> Result<(), GenError> {
    if !(1..=32).contains(&max_depth) {
        return Err(GenError::InvalidArgument("roughen max_depth out of [1,32]"));
    }
    for _ in 0..max_depth {
        if roughen_pass(map, strength, mode, rng) == 0 {
            break;
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

fn apply_method(
    method: &ProcessMethod,
    map: &mut Map,
    rng: &mut Rng,
    generation_class: GenerationClass,
) -> Result<(), GenError> {
    match method {
        ProcessMethod::Scale { factor } => scale_map(map, *factor),
        ProcessMethod::RoomShape { mode, organicity } => {
            if generation_class == GenerationClass::RoomLike {
                apply_room_shapes(map, *mode, *organicity, rng)
            } else {
                Ok(())
            }
        }
        ProcessMethod::PathSmooth {
            strength,
            inner_enabled,
            outer_enabled,
        } => {
            smooth_paths(map, *strength, *inner_enabled, *outer_enabled);
            Ok(())
        }
        ProcessMethod::CorridorRoughen {
            strength,
            max_depth,
            mode,
        } => roughen_corridors(map, *strength, *max_depth, *mode, rng),
    }
}

/// Runs the request's post-process list in order, recording per-step
/// diagnostics. A failing method clears the diagnostics buffer and aborts.
pub fn apply_post_processes(
    request: &GenerateRequest,
    map: &mut Map,
    rng: &mut Rng,
) -> Result<(), GenError> {
    map.metadata.diagnostics.clear_process_steps();
    if request.process.enabled == 0 || request.process.methods.is_empty() {
        return Ok(());
    }

    let generation_class = request.algorithm().generation_class();
    let mut steps: Vec<ProcessStepDiagnostics> = Vec::with_capacity(request.process.methods.len());

    for method in &request.process.methods {
        let before = analyze_top_down_connectivity(map);
        let walkable_before = map.count_walkable();

        if let Err(error) = apply_method(method, map, rng, generation_class) {
            map.metadata.diagnostics.clear_process_steps();
            return Err(error);
        }

        let after = analyze_top_down_connectivity(map);
        let walkable_after = map.count_walkable();

        steps.push(ProcessStepDiagnostics {
            method_type: method.method_type(),
            walkable_before,
            walkable_after,
            walkable_delta: walkable_after as i64 - walkable_before as i64,
            components_before: before.component_count,
            components_after: after.component_count,
            components_delta: after.component_count as i64 - before.component_count as i64,
            connected_before: i32::from(before.connected_floor),
            connected_after: i32::from(after.connected_floor),
        });
    }

    map.metadata.diagnostics.process_steps = steps;
    Ok(())
}
