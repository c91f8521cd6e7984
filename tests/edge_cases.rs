//! Rejection paths, boundary sizes, and template stamping edge cases.

use dungeon_core::error::GenError;
use dungeon_core::generate::generate;
use dungeon_core::io::{load_map, save_map};
use dungeon_core::map::{GenerationClass, ROOM_TYPE_UNASSIGNED};
use dungeon_core::request::{
    Algorithm, AlgorithmParams, BspConfig, DrunkardsWalkConfig, GenerateRequest,
    RoomTypeDefinition, SimplexNoiseConfig, WormCavesConfig,
};

fn scratch_dir() -> std::path::PathBuf {
    tempfile::tempdir().unwrap().keep()
}

#[test]
fn test_minimum_public_size_boundary() {
    let too_small = GenerateRequest::new(Algorithm::DrunkardsWalk, 7, 8, 1);
    assert!(matches!(
        generate(&too_small),
        Err(GenError::InvalidArgument(_))
    ));

    let mut smallest = GenerateRequest::new(Algorithm::DrunkardsWalk, 8, 8, 1);
    smallest.constraints.require_connected_floor = false;
    assert!(generate(&smallest).is_ok());
}

#[test]
fn test_bad_parameters_are_rejected_before_generation() {
    let mut request = GenerateRequest::new(Algorithm::DrunkardsWalk, 20, 20, 1);
    request.params = AlgorithmParams::DrunkardsWalk(DrunkardsWalkConfig { wiggle_percent: -1 });
    assert!(matches!(
        generate(&request),
        Err(GenError::InvalidArgument(_))
    ));

    let mut request = GenerateRequest::new(Algorithm::SimplexNoise, 20, 20, 1);
    request.params = AlgorithmParams::SimplexNoise(SimplexNoiseConfig {
        octaves: 9,
        ..Default::default()
    });
    assert!(matches!(
        generate(&request),
        Err(GenError::InvalidArgument(_))
    ));

    let mut request = GenerateRequest::new(Algorithm::WormCaves, 20, 20, 1);
    request.params = AlgorithmParams::WormCaves(WormCavesConfig {
        brush_radius: 4,
        ..Default::default()
    });
    assert!(matches!(
        generate(&request),
        Err(GenError::InvalidArgument(_))
    ));
}

#[test]
fn test_zero_attempt_budget_is_invalid() {
    let mut request = GenerateRequest::new(Algorithm::OrganicCave, 20, 20, 1);
    request.constraints.max_generation_attempts = 0;
    assert!(matches!(
        generate(&request),
        Err(GenError::InvalidArgument(_))
    ));
}

#[test]
fn test_cave_like_map_has_no_rooms_or_corridors() {
    let mut request = GenerateRequest::new(Algorithm::WormCaves, 32, 32, 5);
    request.constraints.require_connected_floor = false;
    let map = generate(&request).unwrap();
    assert_eq!(map.metadata.generation_class, GenerationClass::CaveLike);
    assert!(map.metadata.rooms.is_empty());
    assert!(map.metadata.corridors.is_empty());
}

#[test]
fn test_template_stamping_end_to_end() {
    let dir = scratch_dir();
    let template_path = dir.join("cave_template.dgmap");

    // A small cave becomes the template; its snapshot replays inside rooms.
    let mut template_request = GenerateRequest::new(Algorithm::OrganicCave, 16, 16, 404);
    template_request.constraints.require_connected_floor = true;
    let template_map = generate(&template_request).unwrap();
    save_map(&template_map, &template_path).unwrap();

    let mut request = GenerateRequest::new(Algorithm::BspTree, 56, 56, 11);
    request.params = AlgorithmParams::BspTree(BspConfig {
        min_rooms: 4,
        max_rooms: 6,
        room_min_size: 6,
        room_max_size: 10,
    });
    let mut definition = RoomTypeDefinition::new(3);
    definition.template_map_path = template_path.to_string_lossy().to_string();
    request.room_types.definitions = vec![definition];
    request.constraints.require_connected_floor = true;
    request.constraints.max_generation_attempts = 4;

    let map = generate(&request).unwrap();
    assert!(map
        .metadata
        .rooms
        .iter()
        .any(|room| room.type_id == 3));
    // Typed rooms were stamped; connectivity still holds end to end.
    assert!(map.metadata.connected_floor);
}

#[test]
fn test_nested_template_is_rejected() {
    let dir = scratch_dir();
    let inner_path = dir.join("inner.dgmap");
    let outer_path = dir.join("outer.dgmap");

    let mut inner_request = GenerateRequest::new(Algorithm::OrganicCave, 16, 16, 1);
    inner_request.constraints.require_connected_floor = true;
    let inner_map = generate(&inner_request).unwrap();
    save_map(&inner_map, &inner_path).unwrap();

    // The outer template's own snapshot references a template, which the
    // stamper must refuse to recurse into.
    let mut outer_request = GenerateRequest::new(Algorithm::BspTree, 40, 40, 2);
    let mut inner_definition = RoomTypeDefinition::new(9);
    inner_definition.template_map_path = inner_path.to_string_lossy().to_string();
    outer_request.room_types.definitions = vec![inner_definition];
    outer_request.params = AlgorithmParams::BspTree(BspConfig {
        min_rooms: 2,
        max_rooms: 4,
        room_min_size: 6,
        room_max_size: 9,
    });
    outer_request.constraints.max_generation_attempts = 4;
    let outer_map = generate(&outer_request).unwrap();
    save_map(&outer_map, &outer_path).unwrap();

    let mut request = GenerateRequest::new(Algorithm::BspTree, 40, 40, 3);
    request.params = AlgorithmParams::BspTree(BspConfig {
        min_rooms: 2,
        max_rooms: 4,
        room_min_size: 6,
        room_max_size: 9,
    });
    let mut definition = RoomTypeDefinition::new(1);
    definition.template_map_path = outer_path.to_string_lossy().to_string();
    request.room_types.definitions = vec![definition];

    assert!(matches!(
        generate(&request),
        Err(GenError::GenerationFailed(_))
    ));
}

#[test]
fn test_missing_template_file_is_io_error() {
    let mut request = GenerateRequest::new(Algorithm::BspTree, 40, 40, 3);
    let mut definition = RoomTypeDefinition::new(1);
    definition.template_map_path = "/nonexistent/template.dgmap".to_string();
    request.room_types.definitions = vec![definition];
    assert!(matches!(generate(&request), Err(GenError::Io(_))));
}

#[test]
fn test_untyped_rooms_allowed_by_default() {
    let mut request = GenerateRequest::new(Algorithm::BspTree, 48, 48, 21);
    // A type nothing qualifies for leaves every room untyped.
    let mut definition = RoomTypeDefinition::new(2);
    definition.constraints.area_min = 100_000;
    request.room_types.definitions = vec![definition];

    let map = generate(&request).unwrap();
    assert!(map
        .metadata
        .rooms
        .iter()
        .all(|room| room.type_id == ROOM_TYPE_UNASSIGNED));
    assert_eq!(
        map.metadata.diagnostics.untyped_room_count,
        map.metadata.rooms.len() as u64
    );
}

#[test]
fn test_loaded_template_snapshot_describes_template() {
    let dir = scratch_dir();
    let path = dir.join("snapshot_check.dgmap");

    let mut request = GenerateRequest::new(Algorithm::CellularAutomata, 24, 24, 31);
    request.constraints.require_connected_floor = true;
    let map = generate(&request).unwrap();
    save_map(&map, &path).unwrap();

    let loaded = load_map(&path).unwrap();
    let snapshot = &loaded.metadata.generation_request;
    assert!(snapshot.present);
    assert_eq!(snapshot.algorithm_id, Algorithm::CellularAutomata as i32);
    assert_eq!(snapshot.width, 24);
    assert_eq!(snapshot.seed, 31);
    assert!(!snapshot.references_templates());
}
