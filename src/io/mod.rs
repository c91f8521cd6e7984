//! Versioned binary map container.
//!
//! Little-endian throughout, fixed field order. The writer emits only the
//! current version; the loader accepts every documented historical version
//! and normalizes to the current in-memory shape. Corrupt fields are
//! `UNSUPPORTED_FORMAT`; truncation surfaces as `IO_ERROR`.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::error::GenError;
use crate::geometry::Rect;
use crate::map::{
    AdjacencySpan, Corridor, EdgeOpeningQuery, GenerationClass, Map, MapMetadata,
    ProcessStepDiagnostics, RequestSnapshot, Room, RoomNeighbor, RoomRole,
    RoomTypeQuotaDiagnostics, Tile, ROOM_TYPE_UNASSIGNED,
};
use crate::request::{
    Algorithm, AlgorithmParams, AssignmentPolicy, BspConfig, CellularAutomataConfig,
    CorridorRoughenMode, CorridorRouting, DrunkardsWalkConfig, OrganicCaveConfig, ProcessMethod,
    RoomGraphConfig, RoomShapeMode, RoomTypeConstraints, RoomTypeDefinition, RoomTypePreferences,
    RoomsAndMazesConfig, RoomsCorridorsConfig, SimplexNoiseConfig, ValueNoiseConfig,
    WormCavesConfig,
};

const MAP_MAGIC: [u8; 4] = *b"DGMP";
pub const MAP_FORMAT_VERSION: u32 = 10;
const MAX_ACCEPTED_VERSION: u32 = 11;

// ---------------------------------------------------------------------------
// Primitive encoding
// ---------------------------------------------------------------------------

fn write_u8<W: Write>(writer: &mut W, value: u8) -> Result<(), GenError> {
    writer.write_all(&[value])?;
    Ok(())
}

fn write_u32<W: Write>(writer: &mut W, value: u32) -> Result<(), GenError> {
    writer.write_all(&value.to_le_bytes())?;
    Ok(())
}

fn write_i32<W: Write>(writer: &mut W, value: i32) -> Result<(), GenError> {
    writer.write_all(&value.to_le_bytes())?;
    Ok(())
}

fn write_u64<W: Write>(writer: &mut W, value: u64) -> Result<(), GenError> {
    writer.write_all(&value.to_le_bytes())?;
    Ok(())
}

fn write_i64<W: Write>(writer: &mut W, value: i64) -> Result<(), GenError> {
    writer.write_all(&value.to_le_bytes())?;
    Ok(())
}

fn read_u8<R: Read>(reader: &mut R) -> Result<u8, GenError> {
    let mut buffer = [0u8; 1];
    reader.read_exact(&mut buffer)?;
    Ok(buffer[0])
}

fn read_u32<R: Read>(reader: &mut R) -> Result<u32, GenError> {
    let mut buffer = [0u8; 4];
    reader.read_exact(&mut buffer)?;
    Ok(u32::from_le_bytes(buffer))
}

fn read_i32<R: Read>(reader: &mut R) -> Result<i32, GenError> {
    let mut buffer = [0u8; 4];
    reader.read_exact(&mut buffer)?;
    Ok(i32::from_le_bytes(buffer))
}

fn read_u64<R: Read>(reader: &mut R) -> Result<u64, GenError> {
    let mut buffer = [0u8; 8];
    reader.read_exact(&mut buffer)?;
    Ok(u64::from_le_bytes(buffer))
}

fn read_i64<R: Read>(reader: &mut R) -> Result<i64, GenError> {
    let mut buffer = [0u8; 8];
    reader.read_exact(&mut buffer)?;
    Ok(i64::from_le_bytes(buffer))
}

fn read_count<R: Read>(reader: &mut R) -> Result<usize, GenError> {
    let value = read_u64(reader)?;
    usize::try_from(value).map_err(|_| GenError::UnsupportedFormat("count exceeds platform size"))
}

fn read_flag<R: Read>(reader: &mut R) -> Result<i32, GenError> {
    let value = read_i32(reader)?;
    if value != 0 && value != 1 {
        return Err(GenError::UnsupportedFormat("flag field must be 0 or 1"));
    }
    Ok(value)
}

// ---------------------------------------------------------------------------
// Save
// ---------------------------------------------------------------------------

fn validate_map_for_save(map: &Map) -> Result<(), GenError> {
    if map.width() < 1 || map.height() < 1 {
        return Err(GenError::InvalidArgument("map dimensions must be positive"));
    }
    for step in &map.metadata.diagnostics.process_steps {
        if !(0..=1).contains(&step.connected_before) || !(0..=1).contains(&step.connected_after) {
            return Err(GenError::InvalidArgument("diagnostics connectivity flags must be 0 or 1"));
        }
    }
    for quota in &map.metadata.diagnostics.room_type_quotas {
        if !(0..=1).contains(&quota.enabled)
            || !(0..=1).contains(&quota.min_satisfied)
            || !(0..=1).contains(&quota.max_satisfied)
            || !(0..=1).contains(&quota.target_satisfied)
        {
            return Err(GenError::InvalidArgument("quota diagnostics flags must be 0 or 1"));
        }
    }
    if map.metadata.generation_request.present {
        let snapshot = &map.metadata.generation_request;
        if snapshot.width < 1 || snapshot.height < 1 {
            return Err(GenError::InvalidArgument("snapshot dimensions must be positive"));
        }
        if Algorithm::from_i32(snapshot.algorithm_id).is_none() {
            return Err(GenError::InvalidArgument("snapshot algorithm id unknown"));
        }
    }
    Ok(())
}

fn write_params<W: Write>(writer: &mut W, params: &AlgorithmParams) -> Result<(), GenError> {
    match params {
        AlgorithmParams::BspTree(c) => {
            write_i32(writer, c.min_rooms)?;
            write_i32(writer, c.max_rooms)?;
            write_i32(writer, c.room_min_size)?;
            write_i32(writer, c.room_max_size)?;
        }
        AlgorithmParams::RoomsAndMazes(c) => {
            write_i32(writer, c.min_rooms)?;
            write_i32(writer, c.max_rooms)?;
            write_i32(writer, c.room_min_size)?;
            write_i32(writer, c.room_max_size)?;
            write_i32(writer, c.maze_wiggle_percent)?;
            write_i32(writer, c.min_room_connections)?;
            write_i32(writer, c.max_room_connections)?;
            write_i32(writer, c.ensure_full_connectivity)?;
            write_i32(writer, c.dead_end_prune_steps)?;
        }
        AlgorithmParams::DrunkardsWalk(c) => {
            write_i32(writer, c.wiggle_percent)?;
        }
        AlgorithmParams::CellularAutomata(c) => {
            write_i32(writer, c.initial_wall_percent)?;
            write_i32(writer, c.simulation_steps)?;
            write_i32(writer, c.wall_threshold)?;
        }
        AlgorithmParams::ValueNoise(c) => {
            write_i32(writer, c.feature_size)?;
            write_i32(writer, c.octaves)?;
            write_i32(writer, c.persistence_percent)?;
            write_i32(writer, c.floor_threshold_percent)?;
        }
        AlgorithmParams::RoomGraph(c) => {
            write_i32(writer, c.min_rooms)?;
            write_i32(writer, c.max_rooms)?;
            write_i32(writer, c.room_min_size)?;
            write_i32(writer, c.room_max_size)?;
            write_i32(writer, c.neighbor_candidates)?;
            write_i32(writer, c.extra_connection_chance_percent)?;
        }
        AlgorithmParams::WormCaves(c) => {
            write_i32(writer, c.worm_count)?;
            write_i32(writer, c.wiggle_percent)?;
            write_i32(writer, c.branch_chance_percent)?;
            write_i32(writer, c.target_floor_percent)?;
            write_i32(writer, c.brush_radius)?;
            write_i32(writer, c.max_steps_per_worm)?;
            write_i32(writer, c.ensure_connected)?;
        }
        AlgorithmParams::SimplexNoise(c) => {
            write_i32(writer, c.feature_size)?;
            write_i32(writer, c.octaves)?;
            write_i32(writer, c.persistence_percent)?;
            write_i32(writer, c.floor_threshold_percent)?;
            write_i32(writer, c.ensure_connected)?;
        }
        AlgorithmParams::RoomsAndCorridors(c) => {
            write_i32(writer, c.min_rooms)?;
            write_i32(writer, c.max_rooms)?;
            write_i32(writer, c.room_min_size)?;
            write_i32(writer, c.room_max_size)?;
            write_i32(writer, c.max_placement_attempts)?;
            write_i32(writer, c.corridor_width)?;
            write_i32(writer, c.corridor_routing as i32)?;
        }
        AlgorithmParams::OrganicCave(c) => {
            write_i32(writer, c.walk_steps)?;
            write_i32(writer, c.brush_radius)?;
            write_i32(writer, c.smoothing_passes)?;
            write_u32(writer, c.target_floor_coverage.to_bits())?;
        }
    }
    Ok(())
}

fn write_method<W: Write>(writer: &mut W, method: &ProcessMethod) -> Result<(), GenError> {
    write_i32(writer, method.method_type())?;
    match method {
        ProcessMethod::Scale { factor } => write_i32(writer, *factor)?,
        ProcessMethod::RoomShape { mode, organicity } => {
            write_i32(writer, *mode as i32)?;
            write_i32(writer, *organicity)?;
        }
        ProcessMethod::PathSmooth {
            strength,
            inner_enabled,
            outer_enabled,
        } => {
            write_i32(writer, *strength)?;
            write_i32(writer, *inner_enabled)?;
            write_i32(writer, *outer_enabled)?;
        }
        ProcessMethod::CorridorRoughen {
            strength,
            max_depth,
            mode,
        } => {
            write_i32(writer, *strength)?;
            write_i32(writer, *max_depth)?;
            write_i32(writer, *mode as i32)?;
        }
    }
    Ok(())
}

fn write_definition<W: Write>(writer: &mut W, definition: &RoomTypeDefinition) -> Result<(), GenError> {
    write_u32(writer, definition.type_id)?;
    write_i32(writer, definition.enabled)?;
    write_i32(writer, definition.min_count)?;
    write_i32(writer, definition.max_count)?;
    write_i32(writer, definition.target_count)?;
    write_i32(writer, definition.constraints.area_min)?;
    write_i32(writer, definition.constraints.area_max)?;
    write_i32(writer, definition.constraints.degree_min)?;
    write_i32(writer, definition.constraints.degree_max)?;
    write_i32(writer, definition.constraints.border_distance_min)?;
    write_i32(writer, definition.constraints.border_distance_max)?;
    write_i32(writer, definition.constraints.graph_depth_min)?;
    write_i32(writer, definition.constraints.graph_depth_max)?;
    write_i32(writer, definition.preferences.weight)?;
    write_i32(writer, definition.preferences.larger_room_bias)?;
    write_i32(writer, definition.preferences.higher_degree_bias)?;
    write_i32(writer, definition.preferences.border_distance_bias)?;
    // Template configuration is part of the replayable snapshot so the
    // nesting rule survives a round trip.
    write_i32(writer, definition.template_required_opening_matches)?;
    write_i32(writer, i32::from(definition.template_opening_query.side_mask))?;
    write_i32(writer, definition.template_opening_query.role)?;
    write_i32(writer, definition.template_opening_query.coord_min)?;
    write_i32(writer, definition.template_opening_query.coord_max)?;
    write_i32(writer, definition.template_opening_query.length_min)?;
    write_i32(writer, definition.template_opening_query.length_max)?;
    write_i32(writer, definition.template_opening_query.require_primary_component)?;
    let path_bytes = definition.template_map_path.as_bytes();
    write_u64(writer, path_bytes.len() as u64)?;
    writer.write_all(path_bytes)?;
    Ok(())
}

fn write_snapshot<W: Write>(writer: &mut W, snapshot: &RequestSnapshot) -> Result<(), GenError> {
    write_u8(writer, u8::from(snapshot.present))?;
    if !snapshot.present {
        return Ok(());
    }

    write_i32(writer, snapshot.width)?;
    write_i32(writer, snapshot.height)?;
    write_u64(writer, snapshot.seed)?;
    write_i32(writer, snapshot.algorithm_id)?;
    write_params(writer, &snapshot.params)?;

    write_u64(writer, snapshot.methods.len() as u64)?;
    for method in &snapshot.methods {
        write_method(writer, method)?;
    }

    write_u64(writer, snapshot.definitions.len() as u64)?;
    write_i32(writer, snapshot.policy.strict_mode)?;
    write_i32(writer, snapshot.policy.allow_untyped_rooms)?;
    write_u32(writer, snapshot.policy.default_type_id)?;
    for definition in &snapshot.definitions {
        write_definition(writer, definition)?;
    }
    Ok(())
}

fn write_diagnostics<W: Write>(
    writer: &mut W,
    metadata: &MapMetadata,
) -> Result<(), GenError> {
    let diagnostics = &metadata.diagnostics;
    write_u64(writer, diagnostics.process_steps.len() as u64)?;
    for step in &diagnostics.process_steps {
        write_i32(writer, step.method_type)?;
        write_u64(writer, step.walkable_before)?;
        write_u64(writer, step.walkable_after)?;
        write_i64(writer, step.walkable_delta)?;
        write_u64(writer, step.components_before)?;
        write_u64(writer, step.components_after)?;
        write_i64(writer, step.components_delta)?;
        write_i32(writer, step.connected_before)?;
        write_i32(writer, step.connected_after)?;
    }

    write_u64(writer, diagnostics.typed_room_count)?;
    write_u64(writer, diagnostics.untyped_room_count)?;
    write_u64(writer, diagnostics.room_type_quotas.len() as u64)?;
    write_u64(writer, diagnostics.room_type_min_miss_count)?;
    write_u64(writer, diagnostics.room_type_max_excess_count)?;
    write_u64(writer, diagnostics.room_type_target_miss_count)?;
    for quota in &diagnostics.room_type_quotas {
        write_u32(writer, quota.type_id)?;
        write_i32(writer, quota.enabled)?;
        write_i32(writer, quota.min_count)?;
        write_i32(writer, quota.max_count)?;
        write_i32(writer, quota.target_count)?;
        write_u64(writer, quota.assigned_count)?;
        write_i32(writer, quota.min_satisfied)?;
        write_i32(writer, quota.max_satisfied)?;
        write_i32(writer, quota.target_satisfied)?;
    }
    Ok(())
}

/// Serializes the map at the current format version.
pub fn write_map<W: Write>(map: &Map, writer: &mut W) -> Result<(), GenError> {
    validate_map_for_save(map)?;

    writer.write_all(&MAP_MAGIC)?;
    write_u32(writer, MAP_FORMAT_VERSION)?;
    write_u32(writer, map.width() as u32)?;
    write_u32(writer, map.height() as u32)?;
    write_u64(writer, map.tile_count() as u64)?;

    let metadata = &map.metadata;
    write_u64(writer, metadata.seed)?;
    write_i32(writer, metadata.algorithm_id)?;
    write_i32(writer, metadata.generation_class as i32)?;
    write_u64(writer, metadata.generation_attempts)?;
    write_u8(writer, u8::from(metadata.connected_floor))?;

    write_u64(writer, metadata.rooms.len() as u64)?;
    write_u64(writer, metadata.corridors.len() as u64)?;
    write_u64(writer, metadata.room_adjacency.len() as u64)?;
    write_u64(writer, metadata.room_neighbors.len() as u64)?;

    write_u64(writer, metadata.walkable_tile_count)?;
    write_u64(writer, metadata.wall_tile_count)?;
    write_u64(writer, metadata.special_room_count)?;
    write_u64(writer, metadata.entrance_room_count)?;
    write_u64(writer, metadata.exit_room_count)?;
    write_u64(writer, metadata.boss_room_count)?;
    write_u64(writer, metadata.treasure_room_count)?;
    write_u64(writer, metadata.shop_room_count)?;
    write_u64(writer, metadata.leaf_room_count)?;
    write_u64(writer, metadata.corridor_total_length)?;
    write_i32(writer, metadata.entrance_exit_distance)?;
    write_u64(writer, metadata.connected_component_count)?;
    write_u64(writer, metadata.largest_component_size)?;

    for tile in map.tiles() {
        write_u8(writer, *tile as u8)?;
    }

    for room in &metadata.rooms {
        write_i32(writer, room.id)?;
        write_i32(writer, room.bounds.x)?;
        write_i32(writer, room.bounds.y)?;
        write_i32(writer, room.bounds.width)?;
        write_i32(writer, room.bounds.height)?;
        write_u32(writer, room.flags)?;
        write_i32(writer, room.role as i32)?;
        write_u32(writer, room.type_id)?;
    }

    for corridor in &metadata.corridors {
        write_i32(writer, corridor.from_room_id)?;
        write_i32(writer, corridor.to_room_id)?;
        write_i32(writer, corridor.width)?;
        write_i32(writer, corridor.length)?;
    }

    for span in &metadata.room_adjacency {
        write_u64(writer, span.start_index)?;
        write_u64(writer, span.count)?;
    }

    for neighbor in &metadata.room_neighbors {
        write_i32(writer, neighbor.room_id)?;
        write_i32(writer, neighbor.corridor_index)?;
    }

    write_snapshot(writer, &metadata.generation_request)?;
    write_diagnostics(writer, metadata)?;
    Ok(())
}

/// Writes the binary container to `path`.
pub fn save_map<P: AsRef<Path>>(map: &Map, path: P) -> Result<(), GenError> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    write_map(map, &mut writer)?;
    writer.flush()?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Load
// ---------------------------------------------------------------------------

fn read_params<R: Read>(reader: &mut R, algorithm: Algorithm) -> Result<AlgorithmParams, GenError> {
    Ok(match algorithm {
        Algorithm::BspTree => AlgorithmParams::BspTree(BspConfig {
            min_rooms: read_i32(reader)?,
            max_rooms: read_i32(reader)?,
            room_min_size: read_i32(reader)?,
            room_max_size: read_i32(reader)?,
        }),
        Algorithm::RoomsAndMazes => AlgorithmParams::RoomsAndMazes(RoomsAndMazesConfig {
            min_rooms: read_i32(reader)?,
            max_rooms: read_i32(reader)?,
            room_min_size: read_i32(reader)?,
            room_max_size: read_i32(reader)?,
            maze_wiggle_percent: read_i32(reader)?,
            min_room_connections: read_i32(reader)?,
            max_room_connections: read_i32(reader)?,
            ensure_full_connectivity: read_i32(reader)?,
            dead_end_prune_steps: read_i32(reader)?,
        }),
        Algorithm::DrunkardsWalk => AlgorithmParams::DrunkardsWalk(DrunkardsWalkConfig {
            wiggle_percent: read_i32(reader)?,
        }),
        Algorithm::CellularAutomata => AlgorithmParams::CellularAutomata(CellularAutomataConfig {
            initial_wall_percent: read_i32(reader)?,
            simulation_steps: read_i32(reader)?,
            wall_threshold: read_i32(reader)?,
        }),
        Algorithm::ValueNoise => AlgorithmParams::ValueNoise(ValueNoiseConfig {
            feature_size: read_i32(reader)?,
            octaves: read_i32(reader)?,
            persistence_percent: read_i32(reader)?,
            floor_threshold_percent: read_i32(reader)?,
        }),
        Algorithm::RoomGraph => AlgorithmParams::RoomGraph(RoomGraphConfig {
            min_rooms: read_i32(reader)?,
            max_rooms: read_i32(reader)?,
            room_min_size: read_i32(reader)?,
            room_max_size: read_i32(reader)?,
            neighbor_candidates: read_i32(reader)?,
            extra_connection_chance_percent: read_i32(reader)?,
        }),
        Algorithm::WormCaves => AlgorithmParams::WormCaves(WormCavesConfig {
            worm_count: read_i32(reader)?,
            wiggle_percent: read_i32(reader)?,
            branch_chance_percent: read_i32(reader)?,
            target_floor_percent: read_i32(reader)?,
            brush_radius: read_i32(reader)?,
            max_steps_per_worm: read_i32(reader)?,
            ensure_connected: read_i32(reader)?,
        }),
        Algorithm::SimplexNoise => AlgorithmParams::SimplexNoise(SimplexNoiseConfig {
            feature_size: read_i32(reader)?,
            octaves: read_i32(reader)?,
            persistence_percent: read_i32(reader)?,
            floor_threshold_percent: read_i32(reader)?,
            ensure_connected: read_i32(reader)?,
        }),
        Algorithm::RoomsAndCorridors => {
            let min_rooms = read_i32(reader)?;
            let max_rooms = read_i32(reader)?;
            let room_min_size = read_i32(reader)?;
            let room_max_size = read_i32(reader)?;
            let max_placement_attempts = read_i32(reader)?;
            let corridor_width = read_i32(reader)?;
            let corridor_routing = CorridorRouting::from_i32(read_i32(reader)?)
                .ok_or(GenError::UnsupportedFormat("unknown corridor routing"))?;
            AlgorithmParams::RoomsAndCorridors(RoomsCorridorsConfig {
                min_rooms,
                max_rooms,
                room_min_size,
                room_max_size,
                max_placement_attempts,
                corridor_width,
                corridor_routing,
            })
        }
        Algorithm::OrganicCave => AlgorithmParams::OrganicCave(OrganicCaveConfig {
            walk_steps: read_i32(reader)?,
            brush_radius: read_i32(reader)?,
            smoothing_passes: read_i32(reader)?,
            target_floor_coverage: f32::from_bits(read_u32(reader)?),
        }),
    })
}

fn read_method<R: Read>(reader: &mut R, version: u32) -> Result<ProcessMethod, GenError> {
    let method_type = read_i32(reader)?;
    match method_type {
        0 => {
            let factor = read_i32(reader)?;
            if factor < 1 {
                return Err(GenError::UnsupportedFormat("scale factor below 1"));
            }
            Ok(ProcessMethod::Scale { factor })
        }
        1 => {
            let mode = RoomShapeMode::from_i32(read_i32(reader)?)
                .ok_or(GenError::UnsupportedFormat("unknown room shape mode"))?;
            let organicity = read_i32(reader)?;
            if !(0..=100).contains(&organicity) {
                return Err(GenError::UnsupportedFormat("room shape organicity out of range"));
            }
            Ok(ProcessMethod::RoomShape { mode, organicity })
        }
        2 => {
            let strength = read_i32(reader)?;
            if !(0..=12).contains(&strength) {
                return Err(GenError::UnsupportedFormat("path smooth strength out of range"));
            }
            let (inner_enabled, outer_enabled) = if version >= 8 {
                (read_flag(reader)?, read_flag(reader)?)
            } else {
                (1, 0)
            };
            Ok(ProcessMethod::PathSmooth {
                strength,
                inner_enabled,
                outer_enabled,
            })
        }
        3 => {
            let strength = read_i32(reader)?;
            let max_depth = read_i32(reader)?;
            let mode = CorridorRoughenMode::from_i32(read_i32(reader)?)
                .ok_or(GenError::UnsupportedFormat("unknown roughen mode"))?;
            if !(0..=100).contains(&strength) || !(1..=32).contains(&max_depth) {
                return Err(GenError::UnsupportedFormat("roughen parameters out of range"));
            }
            Ok(ProcessMethod::CorridorRoughen {
                strength,
                max_depth,
                mode,
            })
        }
        _ => Err(GenError::UnsupportedFormat("unknown process method subtype")),
    }
}

/// v5 stored a fixed `[scale, room_shape_mode, organicity]` tuple; it is
/// reconstructed as `[ROOM_SHAPE?, SCALE?]`.
fn methods_from_legacy_v5(
    scale_factor: i32,
    room_shape_mode: i32,
    organicity: i32,
) -> Result<Vec<ProcessMethod>, GenError> {
    if scale_factor < 1 {
        return Err(GenError::UnsupportedFormat("legacy scale factor below 1"));
    }
    let mode = RoomShapeMode::from_i32(room_shape_mode)
        .ok_or(GenError::UnsupportedFormat("legacy room shape mode unknown"))?;
    if !(0..=100).contains(&organicity) {
        return Err(GenError::UnsupportedFormat("legacy organicity out of range"));
    }

    let mut methods = Vec::new();
    if mode != RoomShapeMode::Rectangular {
        methods.push(ProcessMethod::RoomShape { mode, organicity });
    }
    if scale_factor > 1 {
        methods.push(ProcessMethod::Scale { factor: scale_factor });
    }
    Ok(methods)
}

fn read_definition<R: Read>(reader: &mut R, version: u32) -> Result<RoomTypeDefinition, GenError> {
    let type_id = read_u32(reader)?;
    let enabled = read_flag(reader)?;
    let min_count = read_i32(reader)?;
    let max_count = read_i32(reader)?;
    let target_count = read_i32(reader)?;
    let constraints = RoomTypeConstraints {
        area_min: read_i32(reader)?,
        area_max: read_i32(reader)?,
        degree_min: read_i32(reader)?,
        degree_max: read_i32(reader)?,
        border_distance_min: read_i32(reader)?,
        border_distance_max: read_i32(reader)?,
        graph_depth_min: read_i32(reader)?,
        graph_depth_max: read_i32(reader)?,
    };
    let preferences = RoomTypePreferences {
        weight: read_i32(reader)?,
        larger_room_bias: read_i32(reader)?,
        higher_degree_bias: read_i32(reader)?,
        border_distance_bias: read_i32(reader)?,
    };

    let mut definition = RoomTypeDefinition {
        type_id,
        enabled,
        min_count,
        max_count,
        target_count,
        constraints,
        preferences,
        template_map_path: String::new(),
        template_required_opening_matches: 0,
        template_opening_query: EdgeOpeningQuery::default(),
    };

    // Template configuration joined the definition record in v10.
    if version >= 10 {
        definition.template_required_opening_matches = read_i32(reader)?;
        let side_mask = read_i32(reader)?;
        if !(0..=15).contains(&side_mask) {
            return Err(GenError::UnsupportedFormat("opening query side mask out of range"));
        }
        definition.template_opening_query = EdgeOpeningQuery {
            side_mask: side_mask as u8,
            role: read_i32(reader)?,
            coord_min: read_i32(reader)?,
            coord_max: read_i32(reader)?,
            length_min: read_i32(reader)?,
            length_max: read_i32(reader)?,
            require_primary_component: read_i32(reader)?,
        };
        let path_length = read_count(reader)?;
        if path_length > 4096 {
            return Err(GenError::UnsupportedFormat("template path length unreasonable"));
        }
        let mut bytes = vec![0u8; path_length];
        reader.read_exact(&mut bytes)?;
        definition.template_map_path = String::from_utf8(bytes)
            .map_err(|_| GenError::UnsupportedFormat("template path is not utf-8"))?;
    }

    Ok(definition)
}

fn read_snapshot<R: Read>(reader: &mut R, version: u32) -> Result<RequestSnapshot, GenError> {
    let mut snapshot = RequestSnapshot::default();
    if version < 4 {
        return Ok(snapshot);
    }

    let present = read_u8(reader)?;
    if present > 1 {
        return Err(GenError::UnsupportedFormat("snapshot presence flag must be 0 or 1"));
    }
    if present == 0 {
        return Ok(snapshot);
    }

    snapshot.present = true;
    snapshot.width = read_i32(reader)?;
    snapshot.height = read_i32(reader)?;
    snapshot.seed = read_u64(reader)?;
    snapshot.algorithm_id = read_i32(reader)?;
    if version >= 11 {
        // Five reserved integers, read and discarded.
        for _ in 0..5 {
            let _ = read_i32(reader)?;
        }
    }

    if snapshot.width < 1 || snapshot.height < 1 {
        return Err(GenError::UnsupportedFormat("snapshot dimensions must be positive"));
    }
    let algorithm = Algorithm::from_i32(snapshot.algorithm_id)
        .ok_or(GenError::UnsupportedFormat("unknown algorithm id in snapshot"))?;
    snapshot.params = read_params(reader, algorithm)?;

    if version >= 6 {
        let method_count = read_count(reader)?;
        let mut methods = Vec::with_capacity(method_count.min(1024));
        for _ in 0..method_count {
            methods.push(read_method(reader, version)?);
        }
        snapshot.methods = methods;
    } else if version >= 5 {
        let scale_factor = read_i32(reader)?;
        let room_shape_mode = read_i32(reader)?;
        let organicity = read_i32(reader)?;
        snapshot.methods = methods_from_legacy_v5(scale_factor, room_shape_mode, organicity)?;
    }

    let definition_count = read_count(reader)?;
    snapshot.policy = AssignmentPolicy {
        strict_mode: read_flag(reader)?,
        allow_untyped_rooms: read_flag(reader)?,
        default_type_id: read_u32(reader)?,
        untyped_template_map_path: String::new(),
    };

    let mut definitions = Vec::with_capacity(definition_count.min(1024));
    for _ in 0..definition_count {
        definitions.push(read_definition(reader, version)?);
    }
    snapshot.definitions = definitions;

    Ok(snapshot)
}

fn read_diagnostics<R: Read>(
    reader: &mut R,
    version: u32,
    metadata: &mut MapMetadata,
) -> Result<(), GenError> {
    if version < 9 {
        return Ok(());
    }

    let step_count = read_count(reader)?;
    let mut steps = Vec::with_capacity(step_count.min(1024));
    for _ in 0..step_count {
        steps.push(ProcessStepDiagnostics {
            method_type: read_i32(reader)?,
            walkable_before: read_u64(reader)?,
            walkable_after: read_u64(reader)?,
            walkable_delta: read_i64(reader)?,
            components_before: read_u64(reader)?,
            components_after: read_u64(reader)?,
            components_delta: read_i64(reader)?,
            connected_before: read_flag(reader)?,
            connected_after: read_flag(reader)?,
        });
    }
    metadata.diagnostics.process_steps = steps;

    metadata.diagnostics.typed_room_count = read_u64(reader)?;
    metadata.diagnostics.untyped_room_count = read_u64(reader)?;
    let quota_count = read_count(reader)?;
    metadata.diagnostics.room_type_min_miss_count = read_u64(reader)?;
    metadata.diagnostics.room_type_max_excess_count = read_u64(reader)?;
    metadata.diagnostics.room_type_target_miss_count = read_u64(reader)?;

    let mut quotas = Vec::with_capacity(quota_count.min(1024));
    for _ in 0..quota_count {
        quotas.push(RoomTypeQuotaDiagnostics {
            type_id: read_u32(reader)?,
            enabled: read_flag(reader)?,
            min_count: read_i32(reader)?,
            max_count: read_i32(reader)?,
            target_count: read_i32(reader)?,
            assigned_count: read_u64(reader)?,
            min_satisfied: read_flag(reader)?,
            max_satisfied: read_flag(reader)?,
            target_satisfied: read_flag(reader)?,
        });
    }
    metadata.diagnostics.room_type_quotas = quotas;
    Ok(())
}

/// Deserializes a map from any accepted container version, normalizing to
/// the current in-memory shape.
pub fn read_map<R: Read>(reader: &mut R) -> Result<Map, GenError> {
    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic)?;
    if magic != MAP_MAGIC {
        return Err(GenError::UnsupportedFormat("bad container magic"));
    }

    let version = read_u32(reader)?;
    if version < 1 || version > MAX_ACCEPTED_VERSION {
        return Err(GenError::UnsupportedFormat("unknown container version"));
    }

    let width = read_u32(reader)?;
    let height = read_u32(reader)?;
    let tile_count = read_u64(reader)?;
    if width < 1 || height < 1 || width > i32::MAX as u32 || height > i32::MAX as u32 {
        return Err(GenError::UnsupportedFormat("map dimensions out of range"));
    }
    if u64::from(width) * u64::from(height) != tile_count {
        return Err(GenError::UnsupportedFormat("tile count does not match dimensions"));
    }

    let mut map = Map::new(width as i32, height as i32, Tile::Wall)?;

    map.metadata.seed = read_u64(reader)?;
    map.metadata.algorithm_id = read_i32(reader)?;
    map.metadata.generation_class = if version >= 2 {
        GenerationClass::from_i32(read_i32(reader)?)
            .ok_or(GenError::UnsupportedFormat("unknown generation class"))?
    } else {
        GenerationClass::Unknown
    };
    map.metadata.generation_attempts = read_u64(reader)?;
    let connected = read_u8(reader)?;
    if connected > 1 {
        return Err(GenError::UnsupportedFormat("connected flag must be 0 or 1"));
    }
    map.metadata.connected_floor = connected == 1;

    let room_count = read_count(reader)?;
    let corridor_count = read_count(reader)?;
    let adjacency_count = read_count(reader)?;
    let neighbor_count = read_count(reader)?;

    if map.metadata.generation_class == GenerationClass::Unknown {
        map.metadata.generation_class = if room_count > 0 || corridor_count > 0 {
            GenerationClass::RoomLike
        } else {
            GenerationClass::CaveLike
        };
    }

    map.metadata.walkable_tile_count = read_u64(reader)?;
    map.metadata.wall_tile_count = read_u64(reader)?;
    map.metadata.special_room_count = read_u64(reader)?;
    map.metadata.entrance_room_count = read_u64(reader)?;
    map.metadata.exit_room_count = read_u64(reader)?;
    map.metadata.boss_room_count = read_u64(reader)?;
    map.metadata.treasure_room_count = read_u64(reader)?;
    map.metadata.shop_room_count = read_u64(reader)?;
    map.metadata.leaf_room_count = read_u64(reader)?;
    map.metadata.corridor_total_length = read_u64(reader)?;
    map.metadata.entrance_exit_distance = read_i32(reader)?;
    map.metadata.connected_component_count = read_u64(reader)?;
    map.metadata.largest_component_size = read_u64(reader)?;

    for index in 0..tile_count as usize {
        let value = read_u8(reader)?;
        let tile =
            Tile::from_u8(value).ok_or(GenError::UnsupportedFormat("invalid tile value"))?;
        map.set_tile_at(index, tile);
    }

    let mut rooms = Vec::with_capacity(room_count.min(65_536));
    for _ in 0..room_count {
        let id = read_i32(reader)?;
        let x = read_i32(reader)?;
        let y = read_i32(reader)?;
        let w = read_i32(reader)?;
        let h = read_i32(reader)?;
        let flags = read_u32(reader)?;
        let role = RoomRole::from_i32(read_i32(reader)?)
            .ok_or(GenError::UnsupportedFormat("unknown room role"))?;
        let type_id = if version >= 3 {
            read_u32(reader)?
        } else {
            ROOM_TYPE_UNASSIGNED
        };
        if w <= 0 || h <= 0 {
            return Err(GenError::UnsupportedFormat("room with non-positive extent"));
        }
        rooms.push(Room {
            id,
            bounds: Rect::new(x, y, w, h),
            flags,
            role,
            type_id,
        });
    }
    map.metadata.rooms = rooms;

    let mut corridors = Vec::with_capacity(corridor_count.min(65_536));
    for _ in 0..corridor_count {
        let corridor = Corridor {
            from_room_id: read_i32(reader)?,
            to_room_id: read_i32(reader)?,
            width: read_i32(reader)?,
            length: read_i32(reader)?,
        };
        if corridor.width <= 0 || corridor.length <= 0 {
            return Err(GenError::UnsupportedFormat("corridor with non-positive metrics"));
        }
        corridors.push(corridor);
    }
    map.metadata.corridors = corridors;

    let mut adjacency = Vec::with_capacity(adjacency_count.min(65_536));
    for _ in 0..adjacency_count {
        let span = AdjacencySpan {
            start_index: read_u64(reader)?,
            count: read_u64(reader)?,
        };
        if span.start_index > neighbor_count as u64
            || span.count > neighbor_count as u64
            || span.count > neighbor_count as u64 - span.start_index
        {
            return Err(GenError::UnsupportedFormat("adjacency span out of bounds"));
        }
        adjacency.push(span);
    }
    map.metadata.room_adjacency = adjacency;

    let mut neighbors = Vec::with_capacity(neighbor_count.min(65_536));
    for _ in 0..neighbor_count {
        let neighbor = RoomNeighbor {
            room_id: read_i32(reader)?,
            corridor_index: read_i32(reader)?,
        };
        if neighbor.room_id < 0 || neighbor.room_id as usize >= room_count {
            return Err(GenError::UnsupportedFormat("neighbor references invalid room"));
        }
        if neighbor.corridor_index < 0 || neighbor.corridor_index as usize >= corridor_count {
            return Err(GenError::UnsupportedFormat("neighbor references invalid corridor"));
        }
        neighbors.push(neighbor);
    }
    map.metadata.room_neighbors = neighbors;

    map.metadata.generation_request = read_snapshot(reader, version)?;
    read_diagnostics(reader, version, &mut map.metadata)?;

    Ok(map)
}

/// Loads a map container from `path`.
pub fn load_map<P: AsRef<Path>>(path: P) -> Result<Map, GenError> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    read_map(&mut reader)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    use crate::generate::generate;
    use crate::request::GenerateRequest;

    fn sample_map() -> Map {
        let request = GenerateRequest::new(Algorithm::RoomsAndCorridors, 20, 20, 1337);
        generate(&request).unwrap()
    }

    #[test]
    fn test_roundtrip_structural_equality() {
        let map = sample_map();
        let mut buffer = Vec::new();
        write_map(&map, &mut buffer).unwrap();
        let loaded = read_map(&mut Cursor::new(&buffer)).unwrap();
        assert_eq!(map, loaded);
    }

    #[test]
    fn test_save_is_byte_stable() {
        let map = sample_map();
        let mut first = Vec::new();
        let mut second = Vec::new();
        write_map(&map, &mut first).unwrap();
        write_map(&map, &mut second).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_bad_magic_is_unsupported() {
        let mut buffer = Vec::new();
        write_map(&sample_map(), &mut buffer).unwrap();
        buffer[0] = b'X';
        assert!(matches!(
            read_map(&mut Cursor::new(&buffer)),
            Err(GenError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_unknown_version_is_unsupported() {
        let mut buffer = Vec::new();
        write_map(&sample_map(), &mut buffer).unwrap();
        buffer[4..8].copy_from_slice(&99u32.to_le_bytes());
        assert!(matches!(
            read_map(&mut Cursor::new(&buffer)),
            Err(GenError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_truncation_is_io_error() {
        let mut buffer = Vec::new();
        write_map(&sample_map(), &mut buffer).unwrap();
        buffer.truncate(buffer.len() / 2);
        assert!(matches!(
            read_map(&mut Cursor::new(&buffer)),
            Err(GenError::Io(_))
        ));
    }

    #[test]
    fn test_tile_count_mismatch_is_unsupported() {
        let mut buffer = Vec::new();
        write_map(&sample_map(), &mut buffer).unwrap();
        // Corrupt the tile_count field (offset 16).
        buffer[16..24].copy_from_slice(&1u64.to_le_bytes());
        assert!(matches!(
            read_map(&mut Cursor::new(&buffer)),
            Err(GenError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_invalid_tile_value_is_unsupported() {
        let map = sample_map();
        let mut buffer = Vec::new();
        write_map(&map, &mut buffer).unwrap();
        // Header through metric block: 4+4+4+4+8 + 8+4+4+8+1 + 4*8 + 10*8+4+2*8 bytes.
        let tiles_offset = 24 + 25 + 32 + 100;
        buffer[tiles_offset] = 250;
        assert!(matches!(
            read_map(&mut Cursor::new(&buffer)),
            Err(GenError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_snapshot_survives_roundtrip_with_template_fields() {
        let mut map = sample_map();
        let mut definition = RoomTypeDefinition::new(12);
        definition.template_map_path = "vault.dgmap".to_string();
        definition.template_required_opening_matches = 2;
        map.metadata.generation_request.definitions = vec![definition];

        let mut buffer = Vec::new();
        write_map(&map, &mut buffer).unwrap();
        let loaded = read_map(&mut Cursor::new(&buffer)).unwrap();
        let loaded_definition = &loaded.metadata.generation_request.definitions[0];
        assert_eq!(loaded_definition.template_map_path, "vault.dgmap");
        assert_eq!(loaded_definition.template_required_opening_matches, 2);
        assert!(loaded.metadata.generation_request.references_templates());
    }
}
