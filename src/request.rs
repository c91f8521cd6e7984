//! Generation request: algorithm selection, per-algorithm parameters,
//! acceptance constraints, post-process list, and room-type configuration.
//! Defaults and validation bounds are part of the public contract.

use serde::{Deserialize, Serialize};

use crate::error::GenError;
use crate::geometry::Rect;
use crate::map::{EdgeOpeningQuery, EdgeOpeningSpec, GenerationClass};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i32)]
pub enum Algorithm {
    BspTree = 0,
    RoomsAndMazes = 1,
    DrunkardsWalk = 2,
    CellularAutomata = 3,
    ValueNoise = 4,
    RoomGraph = 5,
    WormCaves = 6,
    SimplexNoise = 7,
    RoomsAndCorridors = 8,
    OrganicCave = 9,
}

impl Algorithm {
    pub fn from_i32(value: i32) -> Option<Algorithm> {
        match value {
            0 => Some(Algorithm::BspTree),
            1 => Some(Algorithm::RoomsAndMazes),
            2 => Some(Algorithm::DrunkardsWalk),
            3 => Some(Algorithm::CellularAutomata),
            4 => Some(Algorithm::ValueNoise),
            5 => Some(Algorithm::RoomGraph),
            6 => Some(Algorithm::WormCaves),
            7 => Some(Algorithm::SimplexNoise),
            8 => Some(Algorithm::RoomsAndCorridors),
            9 => Some(Algorithm::OrganicCave),
            _ => None,
        }
    }

    pub fn generation_class(self) -> GenerationClass {
        match self {
            Algorithm::BspTree
            | Algorithm::RoomsAndMazes
            | Algorithm::RoomGraph
            | Algorithm::RoomsAndCorridors => GenerationClass::RoomLike,
            Algorithm::DrunkardsWalk
            | Algorithm::CellularAutomata
            | Algorithm::ValueNoise
            | Algorithm::WormCaves
            | Algorithm::SimplexNoise
            | Algorithm::OrganicCave => GenerationClass::CaveLike,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Algorithm::BspTree => "bsp_tree",
            Algorithm::RoomsAndMazes => "rooms_and_mazes",
            Algorithm::DrunkardsWalk => "drunkards_walk",
            Algorithm::CellularAutomata => "cellular_automata",
            Algorithm::ValueNoise => "value_noise",
            Algorithm::RoomGraph => "room_graph",
            Algorithm::WormCaves => "worm_caves",
            Algorithm::SimplexNoise => "simplex_noise",
            Algorithm::RoomsAndCorridors => "rooms_and_corridors",
            Algorithm::OrganicCave => "organic_cave",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i32)]
pub enum CorridorRouting {
    Random = 0,
    HorizontalFirst = 1,
    VerticalFirst = 2,
}

impl CorridorRouting {
    pub fn from_i32(value: i32) -> Option<CorridorRouting> {
        match value {
            0 => Some(CorridorRouting::Random),
            1 => Some(CorridorRouting::HorizontalFirst),
            2 => Some(CorridorRouting::VerticalFirst),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BspConfig {
    pub min_rooms: i32,
    pub max_rooms: i32,
    pub room_min_size: i32,
    pub room_max_size: i32,
}

impl Default for BspConfig {
    fn default() -> Self {
        BspConfig {
            min_rooms: 8,
            max_rooms: 16,
            room_min_size: 4,
            room_max_size: 12,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomsAndMazesConfig {
    pub min_rooms: i32,
    pub max_rooms: i32,
    pub room_min_size: i32,
    pub room_max_size: i32,
    pub maze_wiggle_percent: i32,
    pub min_room_connections: i32,
    pub max_room_connections: i32,
    pub ensure_full_connectivity: i32,
    /// -1 prunes dead ends until none remain; N caps the rounds.
    pub dead_end_prune_steps: i32,
}

impl Default for RoomsAndMazesConfig {
    fn default() -> Self {
        RoomsAndMazesConfig {
            min_rooms: 10,
            max_rooms: 24,
            room_min_size: 4,
            room_max_size: 10,
            maze_wiggle_percent: 40,
            min_room_connections: 1,
            max_room_connections: 1,
            ensure_full_connectivity: 1,
            dead_end_prune_steps: -1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrunkardsWalkConfig {
    pub wiggle_percent: i32,
}

impl Default for DrunkardsWalkConfig {
    fn default() -> Self {
        DrunkardsWalkConfig { wiggle_percent: 65 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellularAutomataConfig {
    pub initial_wall_percent: i32,
    pub simulation_steps: i32,
    pub wall_threshold: i32,
}

impl Default for CellularAutomataConfig {
    fn default() -> Self {
        CellularAutomataConfig {
            initial_wall_percent: 47,
            simulation_steps: 5,
            wall_threshold: 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueNoiseConfig {
    pub feature_size: i32,
    pub octaves: i32,
    pub persistence_percent: i32,
    pub floor_threshold_percent: i32,
}

impl Default for ValueNoiseConfig {
    fn default() -> Self {
        ValueNoiseConfig {
            feature_size: 12,
            octaves: 3,
            persistence_percent: 55,
            floor_threshold_percent: 48,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomGraphConfig {
    pub min_rooms: i32,
    pub max_rooms: i32,
    pub room_min_size: i32,
    pub room_max_size: i32,
    pub neighbor_candidates: i32,
    pub extra_connection_chance_percent: i32,
}

impl Default for RoomGraphConfig {
    fn default() -> Self {
        RoomGraphConfig {
            min_rooms: 10,
            max_rooms: 20,
            room_min_size: 4,
            room_max_size: 11,
            neighbor_candidates: 3,
            extra_connection_chance_percent: 20,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WormCavesConfig {
    pub worm_count: i32,
    pub wiggle_percent: i32,
    pub branch_chance_percent: i32,
    pub target_floor_percent: i32,
    pub brush_radius: i32,
    pub max_steps_per_worm: i32,
    pub ensure_connected: i32,
}

impl Default for WormCavesConfig {
    fn default() -> Self {
        WormCavesConfig {
            worm_count: 6,
            wiggle_percent: 55,
            branch_chance_percent: 7,
            target_floor_percent: 34,
            brush_radius: 0,
            max_steps_per_worm: 900,
            ensure_connected: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimplexNoiseConfig {
    pub feature_size: i32,
    pub octaves: i32,
    pub persistence_percent: i32,
    pub floor_threshold_percent: i32,
    pub ensure_connected: i32,
}

impl Default for SimplexNoiseConfig {
    fn default() -> Self {
        SimplexNoiseConfig {
            feature_size: 14,
            octaves: 4,
            persistence_percent: 55,
            floor_threshold_percent: 50,
            ensure_connected: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomsCorridorsConfig {
    pub min_rooms: i32,
    pub max_rooms: i32,
    pub room_min_size: i32,
    pub room_max_size: i32,
    pub max_placement_attempts: i32,
    pub corridor_width: i32,
    pub corridor_routing: CorridorRouting,
}

impl Default for RoomsCorridorsConfig {
    fn default() -> Self {
        RoomsCorridorsConfig {
            min_rooms: 6,
            max_rooms: 12,
            room_min_size: 4,
            room_max_size: 10,
            max_placement_attempts: 500,
            corridor_width: 1,
            corridor_routing: CorridorRouting::Random,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrganicCaveConfig {
    /// <= 0 defaults to width*height steps.
    pub walk_steps: i32,
    pub brush_radius: i32,
    pub smoothing_passes: i32,
    pub target_floor_coverage: f32,
}

impl Default for OrganicCaveConfig {
    fn default() -> Self {
        OrganicCaveConfig {
            walk_steps: 2000,
            brush_radius: 1,
            smoothing_passes: 2,
            target_floor_coverage: 0.30,
        }
    }
}

/// Tagged parameter union keyed by the algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum AlgorithmParams {
    BspTree(BspConfig),
    RoomsAndMazes(RoomsAndMazesConfig),
    DrunkardsWalk(DrunkardsWalkConfig),
    CellularAutomata(CellularAutomataConfig),
    ValueNoise(ValueNoiseConfig),
    RoomGraph(RoomGraphConfig),
    WormCaves(WormCavesConfig),
    SimplexNoise(SimplexNoiseConfig),
    RoomsAndCorridors(RoomsCorridorsConfig),
    OrganicCave(OrganicCaveConfig),
}

impl Default for AlgorithmParams {
    fn default() -> Self {
        AlgorithmParams::BspTree(BspConfig::default())
    }
}

impl AlgorithmParams {
    pub fn defaults_for(algorithm: Algorithm) -> AlgorithmParams {
        match algorithm {
            Algorithm::BspTree => AlgorithmParams::BspTree(BspConfig::default()),
            Algorithm::RoomsAndMazes => AlgorithmParams::RoomsAndMazes(RoomsAndMazesConfig::default()),
            Algorithm::DrunkardsWalk => AlgorithmParams::DrunkardsWalk(DrunkardsWalkConfig::default()),
            Algorithm::CellularAutomata => {
                AlgorithmParams::CellularAutomata(CellularAutomataConfig::default())
            }
            Algorithm::ValueNoise => AlgorithmParams::ValueNoise(ValueNoiseConfig::default()),
            Algorithm::RoomGraph => AlgorithmParams::RoomGraph(RoomGraphConfig::default()),
            Algorithm::WormCaves => AlgorithmParams::WormCaves(WormCavesConfig::default()),
            Algorithm::SimplexNoise => AlgorithmParams::SimplexNoise(SimplexNoiseConfig::default()),
            Algorithm::RoomsAndCorridors => {
                AlgorithmParams::RoomsAndCorridors(RoomsCorridorsConfig::default())
            }
            Algorithm::OrganicCave => AlgorithmParams::OrganicCave(OrganicCaveConfig::default()),
        }
    }

    pub fn algorithm(&self) -> Algorithm {
        match self {
            AlgorithmParams::BspTree(_) => Algorithm::BspTree,
            AlgorithmParams::RoomsAndMazes(_) => Algorithm::RoomsAndMazes,
            AlgorithmParams::DrunkardsWalk(_) => Algorithm::DrunkardsWalk,
            AlgorithmParams::CellularAutomata(_) => Algorithm::CellularAutomata,
            AlgorithmParams::ValueNoise(_) => Algorithm::ValueNoise,
            AlgorithmParams::RoomGraph(_) => Algorithm::RoomGraph,
            AlgorithmParams::WormCaves(_) => Algorithm::WormCaves,
            AlgorithmParams::SimplexNoise(_) => Algorithm::SimplexNoise,
            AlgorithmParams::RoomsAndCorridors(_) => Algorithm::RoomsAndCorridors,
            AlgorithmParams::OrganicCave(_) => Algorithm::OrganicCave,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i32)]
pub enum RoomShapeMode {
    Rectangular = 0,
    Organic = 1,
    Cellular = 2,
    Chamfered = 3,
}

impl RoomShapeMode {
    pub fn from_i32(value: i32) -> Option<RoomShapeMode> {
        match value {
            0 => Some(RoomShapeMode::Rectangular),
            1 => Some(RoomShapeMode::Organic),
            2 => Some(RoomShapeMode::Cellular),
            3 => Some(RoomShapeMode::Chamfered),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i32)]
pub enum CorridorRoughenMode {
    Uniform = 0,
    Organic = 1,
}

impl CorridorRoughenMode {
    pub fn from_i32(value: i32) -> Option<CorridorRoughenMode> {
        match value {
            0 => Some(CorridorRoughenMode::Uniform),
            1 => Some(CorridorRoughenMode::Organic),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            CorridorRoughenMode::Uniform => "uniform",
            CorridorRoughenMode::Organic => "organic",
        }
    }
}

/// One post-process step. The method order in a request is observable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcessMethod {
    Scale {
        factor: i32,
    },
    RoomShape {
        mode: RoomShapeMode,
        organicity: i32,
    },
    PathSmooth {
        strength: i32,
        inner_enabled: i32,
        outer_enabled: i32,
    },
    CorridorRoughen {
        strength: i32,
        max_depth: i32,
        mode: CorridorRoughenMode,
    },
}

impl ProcessMethod {
    pub fn method_type(&self) -> i32 {
        match self {
            ProcessMethod::Scale { .. } => 0,
            ProcessMethod::RoomShape { .. } => 1,
            ProcessMethod::PathSmooth { .. } => 2,
            ProcessMethod::CorridorRoughen { .. } => 3,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessConfig {
    pub enabled: i32,
    pub methods: Vec<ProcessMethod>,
}

/// Numeric eligibility ranges; a max of -1 leaves that bound open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomTypeConstraints {
    pub area_min: i32,
    pub area_max: i32,
    pub degree_min: i32,
    pub degree_max: i32,
    pub border_distance_min: i32,
    pub border_distance_max: i32,
    pub graph_depth_min: i32,
    pub graph_depth_max: i32,
}

impl Default for RoomTypeConstraints {
    fn default() -> Self {
        RoomTypeConstraints {
            area_min: 0,
            area_max: -1,
            degree_min: 0,
            degree_max: -1,
            border_distance_min: 0,
            border_distance_max: -1,
            graph_depth_min: 0,
            graph_depth_max: -1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomTypePreferences {
    pub weight: i32,
    pub larger_room_bias: i32,
    pub higher_degree_bias: i32,
    pub border_distance_bias: i32,
}

impl Default for RoomTypePreferences {
    fn default() -> Self {
        RoomTypePreferences {
            weight: 1,
            larger_room_bias: 0,
            higher_degree_bias: 0,
            border_distance_bias: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomTypeDefinition {
    pub type_id: u32,
    pub enabled: i32,
    pub min_count: i32,
    /// -1 = unbounded.
    pub max_count: i32,
    /// -1 = indifferent.
    pub target_count: i32,
    pub constraints: RoomTypeConstraints,
    pub preferences: RoomTypePreferences,
    /// Persisted map stamped into rooms of this type; empty = no template.
    pub template_map_path: String,
    pub template_required_opening_matches: i32,
    pub template_opening_query: EdgeOpeningQuery,
}

impl RoomTypeDefinition {
    pub fn new(type_id: u32) -> Self {
        RoomTypeDefinition {
            type_id,
            enabled: 1,
            min_count: 0,
            max_count: -1,
            target_count: -1,
            constraints: RoomTypeConstraints::default(),
            preferences: RoomTypePreferences::default(),
            template_map_path: String::new(),
            template_required_opening_matches: 0,
            template_opening_query: EdgeOpeningQuery::default(),
        }
    }
}

impl Default for RoomTypeDefinition {
    fn default() -> Self {
        RoomTypeDefinition::new(0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentPolicy {
    pub strict_mode: i32,
    pub allow_untyped_rooms: i32,
    pub default_type_id: u32,
    /// Template stamped into rooms that end up untyped; empty = none.
    pub untyped_template_map_path: String,
}

impl Default for AssignmentPolicy {
    fn default() -> Self {
        AssignmentPolicy {
            strict_mode: 0,
            allow_untyped_rooms: 1,
            default_type_id: 0,
            untyped_template_map_path: String::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoomTypesConfig {
    pub definitions: Vec<RoomTypeDefinition>,
    pub policy: AssignmentPolicy,
}

/// score = distance_weight * graph_distance_from_entrance
///       + degree_weight * room_degree
///       + leaf_bonus (degree == 1)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RolePlacementWeights {
    pub distance_weight: i32,
    pub degree_weight: i32,
    pub leaf_bonus: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationConstraints {
    pub require_connected_floor: bool,
    pub enforce_outer_walls: bool,
    /// Coverage bounds in [0.0, 1.0]; 0.0 / 1.0 mean "no extra bound".
    pub min_floor_coverage: f32,
    pub max_floor_coverage: f32,
    /// Room constraints apply only to room-like algorithms; 0 disables.
    pub min_room_count: i32,
    pub max_room_count: i32,
    pub min_special_rooms: i32,
    pub required_entrance_rooms: i32,
    pub required_exit_rooms: i32,
    pub required_boss_rooms: i32,
    pub required_treasure_rooms: i32,
    pub required_shop_rooms: i32,
    /// Minimum room-graph hops between entrance and exit when both required.
    pub min_entrance_exit_distance: i32,
    pub require_boss_on_leaf: bool,
    pub entrance_weights: RolePlacementWeights,
    pub exit_weights: RolePlacementWeights,
    pub boss_weights: RolePlacementWeights,
    pub treasure_weights: RolePlacementWeights,
    pub shop_weights: RolePlacementWeights,
    /// Regions that must contain no walkable tile in the returned map.
    pub forbidden_regions: Vec<Rect>,
    pub max_generation_attempts: i32,
}

impl Default for GenerationConstraints {
    fn default() -> Self {
        GenerationConstraints {
            require_connected_floor: true,
            enforce_outer_walls: true,
            min_floor_coverage: 0.0,
            max_floor_coverage: 1.0,
            min_room_count: 0,
            max_room_count: 0,
            min_special_rooms: 0,
            required_entrance_rooms: 0,
            required_exit_rooms: 0,
            required_boss_rooms: 0,
            required_treasure_rooms: 0,
            required_shop_rooms: 0,
            min_entrance_exit_distance: 0,
            require_boss_on_leaf: false,
            entrance_weights: RolePlacementWeights::default(),
            exit_weights: RolePlacementWeights::default(),
            boss_weights: RolePlacementWeights::default(),
            treasure_weights: RolePlacementWeights::default(),
            shop_weights: RolePlacementWeights::default(),
            forbidden_regions: Vec::new(),
            max_generation_attempts: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub width: i32,
    pub height: i32,
    pub seed: u64,
    pub params: AlgorithmParams,
    pub constraints: GenerationConstraints,
    pub edge_openings: Vec<EdgeOpeningSpec>,
    pub process: ProcessConfig,
    pub room_types: RoomTypesConfig,
}

impl GenerateRequest {
    pub fn new(algorithm: Algorithm, width: i32, height: i32, seed: u64) -> Self {
        GenerateRequest {
            width,
            height,
            seed,
            params: AlgorithmParams::defaults_for(algorithm),
            constraints: GenerationConstraints::default(),
            edge_openings: Vec::new(),
            process: ProcessConfig::default(),
            room_types: RoomTypesConfig::default(),
        }
    }

    pub fn algorithm(&self) -> Algorithm {
        self.params.algorithm()
    }
}

fn percent_in_range(value: i32) -> bool {
    (0..=100).contains(&value)
}

fn bias_in_range(value: i32) -> bool {
    (-100..=100).contains(&value)
}

fn nonnegative_range_is_valid(min_value: i32, max_value: i32) -> bool {
    if min_value < 0 {
        return false;
    }
    max_value == -1 || max_value >= min_value
}

fn flag_is_valid(value: i32) -> bool {
    value == 0 || value == 1
}

fn validate_room_sizes(min_rooms: i32, max_rooms: i32, min_size: i32, max_size: i32) -> Result<(), GenError> {
    if min_rooms < 1 {
        return Err(GenError::InvalidArgument("min_rooms must be at least 1"));
    }
    if max_rooms < min_rooms {
        return Err(GenError::InvalidArgument("max_rooms below min_rooms"));
    }
    if min_size < 3 {
        return Err(GenError::InvalidArgument("room_min_size must be at least 3"));
    }
    if max_size < min_size {
        return Err(GenError::InvalidArgument("room_max_size below room_min_size"));
    }
    Ok(())
}

fn validate_params(params: &AlgorithmParams) -> Result<(), GenError> {
    match params {
        AlgorithmParams::BspTree(c) => {
            validate_room_sizes(c.min_rooms, c.max_rooms, c.room_min_size, c.room_max_size)
        }
        AlgorithmParams::RoomsAndMazes(c) => {
            validate_room_sizes(c.min_rooms, c.max_rooms, c.room_min_size, c.room_max_size)?;
            if !percent_in_range(c.maze_wiggle_percent) {
                return Err(GenError::InvalidArgument("maze_wiggle_percent out of [0,100]"));
            }
            if c.min_room_connections < 1 {
                return Err(GenError::InvalidArgument("min_room_connections must be at least 1"));
            }
            if c.max_room_connections < c.min_room_connections {
                return Err(GenError::InvalidArgument("max_room_connections below minimum"));
            }
            if !flag_is_valid(c.ensure_full_connectivity) {
                return Err(GenError::InvalidArgument("ensure_full_connectivity must be 0 or 1"));
            }
            if c.dead_end_prune_steps < -1 {
                return Err(GenError::InvalidArgument("dead_end_prune_steps below -1"));
            }
            Ok(())
        }
        AlgorithmParams::DrunkardsWalk(c) => {
            if !percent_in_range(c.wiggle_percent) {
                return Err(GenError::InvalidArgument("wiggle_percent out of [0,100]"));
            }
            Ok(())
        }
        AlgorithmParams::CellularAutomata(c) => {
            if !percent_in_range(c.initial_wall_percent) {
                return Err(GenError::InvalidArgument("initial_wall_percent out of [0,100]"));
            }
            if !(1..=12).contains(&c.simulation_steps) {
                return Err(GenError::InvalidArgument("simulation_steps out of [1,12]"));
            }
            if !(0..=8).contains(&c.wall_threshold) {
                return Err(GenError::InvalidArgument("wall_threshold out of [0,8]"));
            }
            Ok(())
        }
        AlgorithmParams::ValueNoise(c) => {
            if !(2..=64).contains(&c.feature_size) {
                return Err(GenError::InvalidArgument("feature_size out of [2,64]"));
            }
            if !(1..=6).contains(&c.octaves) {
                return Err(GenError::InvalidArgument("octaves out of [1,6]"));
            }
            if !(10..=90).contains(&c.persistence_percent) {
                return Err(GenError::InvalidArgument("persistence_percent out of [10,90]"));
            }
            if !percent_in_range(c.floor_threshold_percent) {
                return Err(GenError::InvalidArgument("floor_threshold_percent out of [0,100]"));
            }
            Ok(())
        }
        AlgorithmParams::RoomGraph(c) => {
            validate_room_sizes(c.min_rooms, c.max_rooms, c.room_min_size, c.room_max_size)?;
            if !(1..=8).contains(&c.neighbor_candidates) {
                return Err(GenError::InvalidArgument("neighbor_candidates out of [1,8]"));
            }
            if !percent_in_range(c.extra_connection_chance_percent) {
                return Err(GenError::InvalidArgument("extra_connection_chance_percent out of [0,100]"));
            }
            Ok(())
        }
        AlgorithmParams::WormCaves(c) => {
            if !(1..=128).contains(&c.worm_count) {
                return Err(GenError::InvalidArgument("worm_count out of [1,128]"));
            }
            if !percent_in_range(c.wiggle_percent) {
                return Err(GenError::InvalidArgument("wiggle_percent out of [0,100]"));
            }
            if !percent_in_range(c.branch_chance_percent) {
                return Err(GenError::InvalidArgument("branch_chance_percent out of [0,100]"));
            }
            if !(5..=90).contains(&c.target_floor_percent) {
                return Err(GenError::InvalidArgument("target_floor_percent out of [5,90]"));
            }
            if !(0..=3).contains(&c.brush_radius) {
                return Err(GenError::InvalidArgument("brush_radius out of [0,3]"));
            }
            if !(8..=20000).contains(&c.max_steps_per_worm) {
                return Err(GenError::InvalidArgument("max_steps_per_worm out of [8,20000]"));
            }
            if !flag_is_valid(c.ensure_connected) {
                return Err(GenError::InvalidArgument("ensure_connected must be 0 or 1"));
            }
            Ok(())
        }
        AlgorithmParams::SimplexNoise(c) => {
            if !(2..=128).contains(&c.feature_size) {
                return Err(GenError::InvalidArgument("feature_size out of [2,128]"));
            }
            if !(1..=8).contains(&c.octaves) {
                return Err(GenError::InvalidArgument("octaves out of [1,8]"));
            }
            if !(10..=90).contains(&c.persistence_percent) {
                return Err(GenError::InvalidArgument("persistence_percent out of [10,90]"));
            }
            if !percent_in_range(c.floor_threshold_percent) {
                return Err(GenError::InvalidArgument("floor_threshold_percent out of [0,100]"));
            }
            if !flag_is_valid(c.ensure_connected) {
                return Err(GenError::InvalidArgument("ensure_connected must be 0 or 1"));
            }
            Ok(())
        }
        AlgorithmParams::RoomsAndCorridors(c) => {
            validate_room_sizes(c.min_rooms, c.max_rooms, c.room_min_size, c.room_max_size)?;
            if c.max_placement_attempts < 0 {
                return Err(GenError::InvalidArgument("max_placement_attempts must be nonnegative"));
            }
            if !(1..=9).contains(&c.corridor_width) {
                return Err(GenError::InvalidArgument("corridor_width out of [1,9]"));
            }
            Ok(())
        }
        AlgorithmParams::OrganicCave(c) => {
            if !(0..=6).contains(&c.brush_radius) {
                return Err(GenError::InvalidArgument("brush_radius out of [0,6]"));
            }
            if !(0..=8).contains(&c.smoothing_passes) {
                return Err(GenError::InvalidArgument("smoothing_passes out of [0,8]"));
            }
            if !(0.0..=0.9).contains(&c.target_floor_coverage) {
                return Err(GenError::InvalidArgument("target_floor_coverage out of [0,0.9]"));
            }
            Ok(())
        }
    }
}

fn validate_process(process: &ProcessConfig) -> Result<(), GenError> {
    if !flag_is_valid(process.enabled) {
        return Err(GenError::InvalidArgument("process.enabled must be 0 or 1"));
    }
    for method in &process.methods {
        match method {
            ProcessMethod::Scale { factor } => {
                if *factor < 1 {
                    return Err(GenError::InvalidArgument("scale factor below 1"));
                }
            }
            ProcessMethod::RoomShape { organicity, .. } => {
                if !percent_in_range(*organicity) {
                    return Err(GenError::InvalidArgument("room shape organicity out of [0,100]"));
                }
            }
            ProcessMethod::PathSmooth {
                strength,
                inner_enabled,
                outer_enabled,
            } => {
                if !(0..=12).contains(strength) {
                    return Err(GenError::InvalidArgument("path smooth strength out of [0,12]"));
                }
                if !flag_is_valid(*inner_enabled) || !flag_is_valid(*outer_enabled) {
                    return Err(GenError::InvalidArgument("path smooth pass flags must be 0 or 1"));
                }
            }
            ProcessMethod::CorridorRoughen {
                strength, max_depth, ..
            } => {
                if !percent_in_range(*strength) {
                    return Err(GenError::InvalidArgument("roughen strength out of [0,100]"));
                }
                if !(1..=32).contains(max_depth) {
                    return Err(GenError::InvalidArgument("roughen max_depth out of [1,32]"));
                }
            }
        }
    }
    Ok(())
}

fn validate_room_types(config: &RoomTypesConfig) -> Result<(), GenError> {
    if !flag_is_valid(config.policy.strict_mode) {
        return Err(GenError::InvalidArgument("strict_mode must be 0 or 1"));
    }
    if !flag_is_valid(config.policy.allow_untyped_rooms) {
        return Err(GenError::InvalidArgument("allow_untyped_rooms must be 0 or 1"));
    }

    let mut enabled_count = 0usize;
    let mut has_default_type = false;
    for (i, definition) in config.definitions.iter().enumerate() {
        if !flag_is_valid(definition.enabled) {
            return Err(GenError::InvalidArgument("definition enabled must be 0 or 1"));
        }
        if definition.min_count < 0 {
            return Err(GenError::InvalidArgument("min_count must be nonnegative"));
        }
        if definition.max_count != -1 && definition.max_count < definition.min_count {
            return Err(GenError::InvalidArgument("max_count below min_count"));
        }
        if definition.target_count != -1 {
            if definition.target_count < definition.min_count {
                return Err(GenError::InvalidArgument("target_count below min_count"));
            }
            if definition.max_count != -1 && definition.target_count > definition.max_count {
                return Err(GenError::InvalidArgument("target_count above max_count"));
            }
        }
        let c = &definition.constraints;
        if !nonnegative_range_is_valid(c.area_min, c.area_max)
            || !nonnegative_range_is_valid(c.degree_min, c.degree_max)
            || !nonnegative_range_is_valid(c.border_distance_min, c.border_distance_max)
            || !nonnegative_range_is_valid(c.graph_depth_min, c.graph_depth_max)
        {
            return Err(GenError::InvalidArgument("inconsistent room-type constraint range"));
        }
        let p = &definition.preferences;
        if p.weight < 0 {
            return Err(GenError::InvalidArgument("preference weight must be nonnegative"));
        }
        if !bias_in_range(p.larger_room_bias)
            || !bias_in_range(p.higher_degree_bias)
            || !bias_in_range(p.border_distance_bias)
        {
            return Err(GenError::InvalidArgument("preference bias out of [-100,100]"));
        }
        if definition.template_required_opening_matches < 0 {
            return Err(GenError::InvalidArgument("template_required_opening_matches negative"));
        }

        if definition.enabled == 1 {
            enabled_count += 1;
            if definition.type_id == config.policy.default_type_id {
                has_default_type = true;
            }
        }

        for later in &config.definitions[i + 1..] {
            if later.type_id == definition.type_id {
                return Err(GenError::InvalidArgument("duplicate room type id"));
            }
        }
    }

    if config.policy.allow_untyped_rooms == 0 && !config.definitions.is_empty() {
        if enabled_count == 0 {
            return Err(GenError::InvalidArgument("no enabled type with untyped rooms disallowed"));
        }
        if !has_default_type {
            return Err(GenError::InvalidArgument("default type disabled or missing"));
        }
    }

    Ok(())
}

fn validate_constraints(constraints: &GenerationConstraints) -> Result<(), GenError> {
    if !(0.0..=1.0).contains(&constraints.min_floor_coverage)
        || !(0.0..=1.0).contains(&constraints.max_floor_coverage)
        || constraints.max_floor_coverage < constraints.min_floor_coverage
    {
        return Err(GenError::InvalidArgument("floor coverage bounds out of order"));
    }
    if constraints.min_room_count < 0 || constraints.max_room_count < 0 {
        return Err(GenError::InvalidArgument("room count bounds must be nonnegative"));
    }
    if constraints.min_special_rooms < 0 {
        return Err(GenError::InvalidArgument("min_special_rooms must be nonnegative"));
    }
    if constraints.required_entrance_rooms < 0
        || constraints.required_exit_rooms < 0
        || constraints.required_boss_rooms < 0
        || constraints.required_treasure_rooms < 0
        || constraints.required_shop_rooms < 0
    {
        return Err(GenError::InvalidArgument("required role counts must be nonnegative"));
    }
    if constraints.min_entrance_exit_distance < 0 {
        return Err(GenError::InvalidArgument("min_entrance_exit_distance must be nonnegative"));
    }
    if constraints.min_entrance_exit_distance > 0
        && (constraints.required_entrance_rooms < 1 || constraints.required_exit_rooms < 1)
    {
        return Err(GenError::InvalidArgument(
            "entrance/exit distance requires both roles to be required",
        ));
    }
    if constraints.max_room_count > 0
        && constraints.min_room_count > 0
        && constraints.max_room_count < constraints.min_room_count
    {
        return Err(GenError::InvalidArgument("max_room_count below min_room_count"));
    }
    if constraints.max_generation_attempts < 1 {
        return Err(GenError::InvalidArgument("max_generation_attempts must be at least 1"));
    }
    if constraints.max_room_count > 0 {
        let total_required = constraints.required_entrance_rooms
            + constraints.required_exit_rooms
            + constraints.required_boss_rooms
            + constraints.required_treasure_rooms
            + constraints.required_shop_rooms;
        if total_required > constraints.max_room_count {
            return Err(GenError::InvalidArgument("required roles exceed max_room_count"));
        }
    }
    Ok(())
}

fn validate_edge_openings(request: &GenerateRequest) -> Result<(), GenError> {
    for spec in &request.edge_openings {
        if spec.end < spec.start {
            return Err(GenError::InvalidArgument("edge opening end before start"));
        }
        let span = match spec.side {
            crate::map::EdgeSide::Top | crate::map::EdgeSide::Bottom => request.width,
            crate::map::EdgeSide::Left | crate::map::EdgeSide::Right => request.height,
        };
        if spec.start < 0 || spec.end >= span {
            return Err(GenError::InvalidArgument("edge opening outside border span"));
        }
    }
    Ok(())
}

/// Pre-generate request validation (§C9). Does not touch the tile grid.
pub fn validate_request(request: &GenerateRequest) -> Result<(), GenError> {
    validate_room_types(&request.room_types)?;
    validate_process(&request.process)?;
    validate_constraints(&request.constraints)?;
    validate_edge_openings(request)?;
    validate_params(&request.params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::{EdgeOpeningRole, EdgeSide};

    #[test]
    fn test_default_request_is_valid() {
        for algorithm in [
            Algorithm::BspTree,
            Algorithm::RoomsAndMazes,
            Algorithm::DrunkardsWalk,
            Algorithm::CellularAutomata,
            Algorithm::ValueNoise,
            Algorithm::RoomGraph,
            Algorithm::WormCaves,
            Algorithm::SimplexNoise,
            Algorithm::RoomsAndCorridors,
            Algorithm::OrganicCave,
        ] {
            let request = GenerateRequest::new(algorithm, 32, 32, 1);
            assert!(validate_request(&request).is_ok(), "{:?}", algorithm);
            assert_eq!(request.algorithm(), algorithm);
        }
    }

    #[test]
    fn test_rejects_out_of_range_wiggle() {
        let mut request = GenerateRequest::new(Algorithm::DrunkardsWalk, 32, 32, 1);
        request.params = AlgorithmParams::DrunkardsWalk(DrunkardsWalkConfig { wiggle_percent: 101 });
        assert!(validate_request(&request).is_err());
    }

    #[test]
    fn test_rejects_duplicate_type_ids() {
        let mut request = GenerateRequest::new(Algorithm::BspTree, 32, 32, 1);
        request.room_types.definitions = vec![RoomTypeDefinition::new(7), RoomTypeDefinition::new(7)];
        assert!(validate_request(&request).is_err());
    }

    #[test]
    fn test_rejects_disabled_default_type() {
        let mut request = GenerateRequest::new(Algorithm::BspTree, 32, 32, 1);
        let mut definition = RoomTypeDefinition::new(3);
        definition.enabled = 0;
        request.room_types.definitions = vec![definition];
        request.room_types.policy.allow_untyped_rooms = 0;
        request.room_types.policy.default_type_id = 3;
        assert!(validate_request(&request).is_err());
    }

    #[test]
    fn test_rejects_inverted_coverage_bounds() {
        let mut request = GenerateRequest::new(Algorithm::OrganicCave, 32, 32, 1);
        request.constraints.min_floor_coverage = 0.8;
        request.constraints.max_floor_coverage = 0.2;
        assert!(validate_request(&request).is_err());
    }

    #[test]
    fn test_rejects_edge_opening_outside_span() {
        let mut request = GenerateRequest::new(Algorithm::BspTree, 20, 12, 1);
        request.edge_openings.push(EdgeOpeningSpec {
            side: EdgeSide::Left,
            start: 4,
            end: 14,
            role: EdgeOpeningRole::None,
        });
        assert!(validate_request(&request).is_err());
    }

    #[test]
    fn test_distance_requires_required_roles() {
        let mut request = GenerateRequest::new(Algorithm::BspTree, 32, 32, 1);
        request.constraints.min_entrance_exit_distance = 3;
        assert!(validate_request(&request).is_err());
        request.constraints.required_entrance_rooms = 1;
        request.constraints.required_exit_rooms = 1;
        assert!(validate_request(&request).is_ok());
    }
}
