//! PNG + JSON side-car export.
//!
//! The PNG is a tile-color RGBA8 render with an optional per-type overlay on
//! typed room floors; the JSON carries the legend, the room-type palette,
//! map metadata, rooms, corridors, entrances, edge openings, and the full
//! request snapshot. Consumers parse the JSON by field name.

use std::path::Path;

use serde_json::{json, Value};

use crate::error::GenError;
use crate::map::{Map, Tile, ROOM_TYPE_UNASSIGNED};
use crate::request::{Algorithm, AlgorithmParams, ProcessMethod};

const EXPORT_FORMAT: &str = "dungeoneer_png_json_v1";

/// Fixed base tile palette.
fn tile_rgba(tile: Tile) -> [u8; 4] {
    match tile {
        Tile::Void => [0, 0, 0, 0],
        Tile::Wall => [24, 28, 34, 255],
        Tile::Floor => [232, 232, 228, 255],
        Tile::Door => [208, 156, 66, 255],
    }
}

/// Deterministic per-type overlay color from a Knuth hash of the type id.
fn room_type_rgba(type_id: u32) -> [u8; 4] {
    let hash = type_id.wrapping_mul(2_654_435_761);
    [
        80 + (hash & 0x5F) as u8,
        95 + ((hash >> 8) & 0x5F) as u8,
        105 + ((hash >> 16) & 0x5F) as u8,
        255,
    ]
}

struct PaletteEntry {
    type_id: u32,
    room_count: u64,
    tile_count: u64,
    rgba: [u8; 4],
}

/// Maps every tile to its owning typed room (if any) and accumulates the
/// per-type palette.
fn build_room_type_overlay(map: &Map) -> (Vec<i32>, Vec<PaletteEntry>) {
    let mut room_by_tile = vec![-1i32; map.tile_count()];
    let mut palette: Vec<PaletteEntry> = Vec::new();

    for room in &map.metadata.rooms {
        if room.type_id == ROOM_TYPE_UNASSIGNED {
            continue;
        }

        let entry_index = match palette.iter().position(|e| e.type_id == room.type_id) {
            Some(index) => index,
            None => {
                palette.push(PaletteEntry {
                    type_id: room.type_id,
                    room_count: 0,
                    tile_count: 0,
                    rgba: room_type_rgba(room.type_id),
                });
                palette.len() - 1
            }
        };
        palette[entry_index].room_count += 1;

        for y in room.bounds.y..room.bounds.y + room.bounds.height {
            for x in room.bounds.x..room.bounds.x + room.bounds.width {
                if !map.in_bounds(x, y) || !map.get_tile(x, y).is_walkable() {
                    continue;
                }
                let index = map.tile_index(x, y);
                if room_by_tile[index] < 0 {
                    room_by_tile[index] = room.id;
                    palette[entry_index].tile_count += 1;
                }
            }
        }
    }

    (room_by_tile, palette)
}

fn render_rgba(map: &Map, room_by_tile: &[i32]) -> Vec<u8> {
    let mut pixels = Vec::with_capacity(map.tile_count() * 4);
    for (index, tile) in map.tiles().iter().enumerate() {
        let mut rgba = tile_rgba(*tile);
        if tile.is_walkable() && room_by_tile[index] >= 0 {
            let room = &map.metadata.rooms[room_by_tile[index] as usize];
            if room.type_id != ROOM_TYPE_UNASSIGNED {
                rgba = room_type_rgba(room.type_id);
            }
        }
        pixels.extend_from_slice(&rgba);
    }
    pixels
}

fn params_json(params: &AlgorithmParams) -> Value {
    match params {
        AlgorithmParams::BspTree(c) => json!({
            "min_rooms": c.min_rooms,
            "max_rooms": c.max_rooms,
            "room_min_size": c.room_min_size,
            "room_max_size": c.room_max_size,
        }),
        AlgorithmParams::RoomsAndMazes(c) => json!({
            "min_rooms": c.min_rooms,
            "max_rooms": c.max_rooms,
            "room_min_size": c.room_min_size,
            "room_max_size": c.room_max_size,
            "maze_wiggle_percent": c.maze_wiggle_percent,
            "min_room_connections": c.min_room_connections,
            "max_room_connections": c.max_room_connections,
            "ensure_full_connectivity": c.ensure_full_connectivity,
            "dead_end_prune_steps": c.dead_end_prune_steps,
        }),
        AlgorithmParams::DrunkardsWalk(c) => json!({
            "wiggle_percent": c.wiggle_percent,
        }),
        AlgorithmParams::CellularAutomata(c) => json!({
            "initial_wall_percent": c.initial_wall_percent,
            "simulation_steps": c.simulation_steps,
            "wall_threshold": c.wall_threshold,
        }),
        AlgorithmParams::ValueNoise(c) => json!({
            "feature_size": c.feature_size,
            "octaves": c.octaves,
            "persistence_percent": c.persistence_percent,
            "floor_threshold_percent": c.floor_threshold_percent,
        }),
        AlgorithmParams::RoomGraph(c) => json!({
            "min_rooms": c.min_rooms,
            "max_rooms": c.max_rooms,
            "room_min_size": c.room_min_size,
            "room_max_size": c.room_max_size,
            "neighbor_candidates": c.neighbor_candidates,
            "extra_connection_chance_percent": c.extra_connection_chance_percent,
        }),
        AlgorithmParams::WormCaves(c) => json!({
            "worm_count": c.worm_count,
            "wiggle_percent": c.wiggle_percent,
            "branch_chance_percent": c.branch_chance_percent,
            "target_floor_percent": c.target_floor_percent,
            "brush_radius": c.brush_radius,
            "max_steps_per_worm": c.max_steps_per_worm,
            "ensure_connected": c.ensure_connected,
        }),
        AlgorithmParams::SimplexNoise(c) => json!({
            "feature_size": c.feature_size,
            "octaves": c.octaves,
            "persistence_percent": c.persistence_percent,
            "floor_threshold_percent": c.floor_threshold_percent,
            "ensure_connected": c.ensure_connected,
        }),
        AlgorithmParams::RoomsAndCorridors(c) => json!({
            "min_rooms": c.min_rooms,
            "max_rooms": c.max_rooms,
            "room_min_size": c.room_min_size,
            "room_max_size": c.room_max_size,
            "max_placement_attempts": c.max_placement_attempts,
            "corridor_width": c.corridor_width,
            "corridor_routing": c.corridor_routing as i32,
        }),
        AlgorithmParams::OrganicCave(c) => json!({
            "walk_steps": c.walk_steps,
            "brush_radius": c.brush_radius,
            "smoothing_passes": c.smoothing_passes,
            "target_floor_coverage": c.target_floor_coverage,
        }),
    }
}

fn method_json(method: &ProcessMethod) -> Value {
    match method {
        ProcessMethod::Scale { factor } => json!({
            "type": method.method_type(),
            "scale": { "factor": factor },
        }),
        ProcessMethod::RoomShape { mode, organicity } => json!({
            "type": method.method_type(),
            "mode": *mode as i32,
            "organicity": organicity,
        }),
        ProcessMethod::PathSmooth {
            strength,
            inner_enabled,
            outer_enabled,
        } => json!({
            "type": method.method_type(),
            "strength": strength,
            "inner_enabled": inner_enabled,
            "outer_enabled": outer_enabled,
        }),
        ProcessMethod::CorridorRoughen {
            strength,
            max_depth,
            mode,
        } => json!({
            "type": method.method_type(),
            "corridor_roughen": {
                "strength": strength,
                "max_depth": max_depth,
                "mode": *mode as i32,
                "mode_name": mode.name(),
            },
        }),
    }
}

fn snapshot_json(map: &Map) -> Value {
    let snapshot = &map.metadata.generation_request;
    if !snapshot.present {
        return Value::Null;
    }

    let algorithm_name = Algorithm::from_i32(snapshot.algorithm_id)
        .map(|a| a.name())
        .unwrap_or("unknown");

    json!({
        "width": snapshot.width,
        "height": snapshot.height,
        "seed": snapshot.seed,
        "algorithm_id": snapshot.algorithm_id,
        "algorithm": algorithm_name,
        "params": params_json(&snapshot.params),
        "post_process_enabled": i32::from(!snapshot.methods.is_empty()),
        "process": snapshot.methods.iter().map(method_json).collect::<Vec<_>>(),
        "room_types": {
            "strict_mode": snapshot.policy.strict_mode,
            "allow_untyped_rooms": snapshot.policy.allow_untyped_rooms,
            "default_type_id": snapshot.policy.default_type_id,
            "definitions": snapshot.definitions.iter().map(|d| json!({
                "type_id": d.type_id,
                "enabled": d.enabled,
                "min_count": d.min_count,
                "max_count": d.max_count,
                "target_count": d.target_count,
                "constraints": {
                    "area_min": d.constraints.area_min,
                    "area_max": d.constraints.area_max,
                    "degree_min": d.constraints.degree_min,
                    "degree_max": d.constraints.degree_max,
                    "border_distance_min": d.constraints.border_distance_min,
                    "border_distance_max": d.constraints.border_distance_max,
                    "graph_depth_min": d.constraints.graph_depth_min,
                    "graph_depth_max": d.constraints.graph_depth_max,
                },
                "weight": d.preferences.weight,
                "larger_room_bias": d.preferences.larger_room_bias,
                "higher_degree_bias": d.preferences.higher_degree_bias,
                "border_distance_bias": d.preferences.border_distance_bias,
                "template_map_path": d.template_map_path,
                "template_required_opening_matches": d.template_required_opening_matches,
                "template_opening_query": {
                    "side_mask": d.template_opening_query.side_mask,
                    "role_mask": d.template_opening_query.role,
                    "edge_coord_min": d.template_opening_query.coord_min,
                    "edge_coord_max": d.template_opening_query.coord_max,
                    "min_length": d.template_opening_query.length_min,
                    "max_length": d.template_opening_query.length_max,
                    "require_component": d.template_opening_query.require_primary_component,
                },
            })).collect::<Vec<_>>(),
        },
    })
}

fn map_json(map: &Map, png_path: &str, palette: &[PaletteEntry]) -> Value {
    let metadata = &map.metadata;
    json!({
        "format": EXPORT_FORMAT,
        "image": png_path,
        "legend": ([Tile::Void, Tile::Wall, Tile::Floor, Tile::Door]).iter().map(|tile| json!({
            "tile_id": *tile as u8,
            "tile_name": tile.name(),
            "rgba": tile_rgba(*tile),
        })).collect::<Vec<_>>(),
        "room_type_palette": palette.iter().map(|entry| json!({
            "type_id": entry.type_id,
            "room_count": entry.room_count,
            "tile_count": entry.tile_count,
            "rgba": entry.rgba,
        })).collect::<Vec<_>>(),
        "metadata": {
            "width": map.width(),
            "height": map.height(),
            "tile_count": map.tile_count(),
            "seed": metadata.seed,
            "algorithm_id": metadata.algorithm_id,
            "algorithm": Algorithm::from_i32(metadata.algorithm_id).map(|a| a.name()).unwrap_or("unknown"),
            "generation_class": metadata.generation_class as i32,
            "generation_class_name": metadata.generation_class.name(),
            "generation_attempts": metadata.generation_attempts,
            "walkable_tile_count": metadata.walkable_tile_count,
            "wall_tile_count": metadata.wall_tile_count,
            "room_count": metadata.rooms.len(),
            "corridor_count": metadata.corridors.len(),
            "room_entrance_count": metadata.room_entrances.len(),
            "edge_opening_count": metadata.edge_openings.len(),
            "corridor_total_length": metadata.corridor_total_length,
            "entrance_exit_distance": metadata.entrance_exit_distance,
            "connected_component_count": metadata.connected_component_count,
            "largest_component_size": metadata.largest_component_size,
            "connected_floor": metadata.connected_floor,
            "typed_room_count": metadata.diagnostics.typed_room_count,
            "untyped_room_count": metadata.diagnostics.untyped_room_count,
        },
        "rooms": metadata.rooms.iter().map(|room| json!({
            "id": room.id,
            "x": room.bounds.x,
            "y": room.bounds.y,
            "width": room.bounds.width,
            "height": room.bounds.height,
            "flags": room.flags,
            "role": room.role as i32,
            "role_name": room.role.name(),
            "type_id": room.type_id,
        })).collect::<Vec<_>>(),
        "corridors": metadata.corridors.iter().map(|corridor| json!({
            "from_room_id": corridor.from_room_id,
            "to_room_id": corridor.to_room_id,
            "width": corridor.width,
            "length": corridor.length,
        })).collect::<Vec<_>>(),
        "room_entrances": metadata.room_entrances.iter().map(|entrance| json!({
            "room_id": entrance.room_id,
            "room_x": entrance.room_tile.x,
            "room_y": entrance.room_tile.y,
            "corridor_x": entrance.corridor_tile.x,
            "corridor_y": entrance.corridor_tile.y,
            "normal_x": entrance.normal.x,
            "normal_y": entrance.normal.y,
        })).collect::<Vec<_>>(),
        "edge_openings": metadata.edge_openings.iter().map(|opening| json!({
            "id": opening.id,
            "side": opening.side as i32,
            "side_name": opening.side.name(),
            "start": opening.start,
            "end": opening.end,
            "length": opening.length,
            "edge_x": opening.edge_tile.x,
            "edge_y": opening.edge_tile.y,
            "inward_x": opening.inward_tile.x,
            "inward_y": opening.inward_tile.y,
            "normal_x": opening.normal.x,
            "normal_y": opening.normal.y,
            "component_id": opening.component_id,
            "role": opening.role as i32,
            "role_name": opening.role.name(),
        })).collect::<Vec<_>>(),
        "generation_request": snapshot_json(map),
    })
}

/// Writes the RGBA8 PNG render and the JSON side-car.
pub fn export_png_json<P: AsRef<Path>, Q: AsRef<Path>>(
    map: &Map,
    png_path: P,
    json_path: Q,
) -> Result<(), GenError> {
    let (room_by_tile, palette) = build_room_type_overlay(map);
    let pixels = render_rgba(map, &room_by_tile);

    let image = image::RgbaImage::from_raw(map.width() as u32, map.height() as u32, pixels)
        .ok_or(GenError::AllocationFailed("pixel buffer size mismatch"))?;
    image
        .save_with_format(&png_path, image::ImageFormat::Png)
        .map_err(|_| GenError::Io(std::io::Error::other("png encode failed")))?;

    let png_path_str = png_path.as_ref().to_string_lossy().to_string();
    let document = map_json(map, &png_path_str, &palette);
    let rendered = serde_json::to_string_pretty(&document)
        .map_err(|_| GenError::Io(std::io::Error::other("json encode failed")))?;
    std::fs::write(json_path, rendered)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generate::generate;
    use crate::request::GenerateRequest;

    #[test]
    fn test_tile_palette_is_fixed() {
        assert_eq!(tile_rgba(Tile::Void), [0, 0, 0, 0]);
        assert_eq!(tile_rgba(Tile::Wall), [24, 28, 34, 255]);
        assert_eq!(tile_rgba(Tile::Floor), [232, 232, 228, 255]);
        assert_eq!(tile_rgba(Tile::Door), [208, 156, 66, 255]);
    }

    #[test]
    fn test_room_type_color_is_deterministic_and_bounded() {
        let a = room_type_rgba(7);
        let b = room_type_rgba(7);
        assert_eq!(a, b);
        assert!(a[0] >= 80 && a[0] < 80 + 96);
        assert!(a[1] >= 95 && a[1] < 95 + 96);
        assert!(a[2] >= 105 && a[2] < 105 + 96);
        assert_eq!(a[3], 255);
        assert_ne!(room_type_rgba(7), room_type_rgba(8));
    }

    #[test]
    fn test_json_document_carries_expected_sections() {
        let request = GenerateRequest::new(Algorithm::RoomsAndCorridors, 20, 20, 1337);
        let map = generate(&request).unwrap();
        let (_, palette) = build_room_type_overlay(&map);
        let document = map_json(&map, "out.png", &palette);

        assert_eq!(document["format"], EXPORT_FORMAT);
        assert_eq!(document["legend"].as_array().unwrap().len(), 4);
        assert_eq!(document["metadata"]["width"], 20);
        assert_eq!(
            document["rooms"].as_array().unwrap().len(),
            map.metadata.rooms.len()
        );
        assert_eq!(document["generation_request"]["seed"], 1337);
        assert_eq!(
            document["generation_request"]["algorithm"],
            "rooms_and_corridors"
        );
    }

    #[test]
    fn test_render_overlays_typed_rooms_only() {
        let request = GenerateRequest::new(Algorithm::RoomsAndCorridors, 20, 20, 5);
        let mut map = generate(&request).unwrap();
        map.metadata.rooms[0].type_id = 42;

        let (room_by_tile, palette) = build_room_type_overlay(&map);
        assert_eq!(palette.len(), 1);
        assert!(palette[0].tile_count > 0);

        let pixels = render_rgba(&map, &room_by_tile);
        let bounds = map.metadata.rooms[0].bounds;
        let center = map.tile_index(bounds.x + bounds.width / 2, bounds.y + bounds.height / 2);
        let overlay = room_type_rgba(42);
        assert_eq!(&pixels[center * 4..center * 4 + 4], &overlay);
    }
}
