//! Tile grid plus owned metadata arenas.
//!
//! A [`Map`] owns its tiles and every metadata array (rooms, corridors, the
//! CSR room-adjacency graph, detected entrances and edge openings,
//! diagnostics, and the originating request snapshot). Identifiers are dense
//! indices into these arrays; cloning a map deep-clones every arena.

use serde::{Deserialize, Serialize};

use crate::error::GenError;
use crate::geometry::{Point, Rect};
use crate::request::{AlgorithmParams, AssignmentPolicy, ProcessMethod, RoomTypeDefinition};

/// Sentinel for rooms that carry no assigned type.
pub const ROOM_TYPE_UNASSIGNED: u32 = 0xFFFF_FFFF;

/// Room flag bits. Only `SPECIAL` is reserved today.
pub const ROOM_FLAG_NONE: u32 = 0;
pub const ROOM_FLAG_SPECIAL: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum Tile {
    Void = 0,
    Wall = 1,
    Floor = 2,
    Door = 3,
}

impl Tile {
    pub fn is_walkable(self) -> bool {
        matches!(self, Tile::Floor | Tile::Door)
    }

    pub fn from_u8(value: u8) -> Option<Tile> {
        match value {
            0 => Some(Tile::Void),
            1 => Some(Tile::Wall),
            2 => Some(Tile::Floor),
            3 => Some(Tile::Door),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Tile::Void => "void",
            Tile::Wall => "wall",
            Tile::Floor => "floor",
            Tile::Door => "door",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i32)]
pub enum RoomRole {
    None = 0,
    Entrance = 1,
    Exit = 2,
    Boss = 3,
    Treasure = 4,
    Shop = 5,
}

impl RoomRole {
    pub fn from_i32(value: i32) -> Option<RoomRole> {
        match value {
            0 => Some(RoomRole::None),
            1 => Some(RoomRole::Entrance),
            2 => Some(RoomRole::Exit),
            3 => Some(RoomRole::Boss),
            4 => Some(RoomRole::Treasure),
            5 => Some(RoomRole::Shop),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            RoomRole::None => "none",
            RoomRole::Entrance => "entrance",
            RoomRole::Exit => "exit",
            RoomRole::Boss => "boss",
            RoomRole::Treasure => "treasure",
            RoomRole::Shop => "shop",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i32)]
pub enum GenerationClass {
    Unknown = 0,
    RoomLike = 1,
    CaveLike = 2,
}

impl GenerationClass {
    pub fn from_i32(value: i32) -> Option<GenerationClass> {
        match value {
            0 => Some(GenerationClass::Unknown),
            1 => Some(GenerationClass::RoomLike),
            2 => Some(GenerationClass::CaveLike),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            GenerationClass::Unknown => "unknown",
            GenerationClass::RoomLike => "room_like",
            GenerationClass::CaveLike => "cave_like",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: i32,
    pub bounds: Rect,
    pub flags: u32,
    pub role: RoomRole,
    pub type_id: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Corridor {
    pub from_room_id: i32,
    pub to_room_id: i32,
    pub width: i32,
    pub length: i32,
}

/// One row of the CSR room-adjacency index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AdjacencySpan {
    pub start_index: u64,
    pub count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomNeighbor {
    pub room_id: i32,
    pub corridor_index: i32,
}

/// A walkable room-boundary tile that opens onto a non-room walkable tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomEntrance {
    pub room_id: i32,
    pub room_tile: Point,
    pub corridor_tile: Point,
    /// Unit step from the room tile toward the corridor tile.
    pub normal: Point,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i32)]
pub enum EdgeSide {
    Top = 0,
    Right = 1,
    Bottom = 2,
    Left = 3,
}

impl EdgeSide {
    pub fn from_i32(value: i32) -> Option<EdgeSide> {
        match value {
            0 => Some(EdgeSide::Top),
            1 => Some(EdgeSide::Right),
            2 => Some(EdgeSide::Bottom),
            3 => Some(EdgeSide::Left),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            EdgeSide::Top => "top",
            EdgeSide::Right => "right",
            EdgeSide::Bottom => "bottom",
            EdgeSide::Left => "left",
        }
    }

    /// Bit used by [`EdgeOpeningQuery::side_mask`].
    pub fn mask_bit(self) -> u8 {
        1u8 << (self as i32 as u8)
    }

    /// Inward unit normal (into the map).
    pub fn inward_normal(self) -> Point {
        match self {
            EdgeSide::Top => Point::new(0, 1),
            EdgeSide::Right => Point::new(-1, 0),
            EdgeSide::Bottom => Point::new(0, -1),
            EdgeSide::Left => Point::new(1, 0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i32)]
pub enum EdgeOpeningRole {
    None = 0,
    Entrance = 1,
    Exit = 2,
}

impl EdgeOpeningRole {
    pub fn from_i32(value: i32) -> Option<EdgeOpeningRole> {
        match value {
            0 => Some(EdgeOpeningRole::None),
            1 => Some(EdgeOpeningRole::Entrance),
            2 => Some(EdgeOpeningRole::Exit),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            EdgeOpeningRole::None => "none",
            EdgeOpeningRole::Entrance => "entrance",
            EdgeOpeningRole::Exit => "exit",
        }
    }
}

/// A maximal walkable run along one map border.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeOpening {
    pub id: u32,
    pub side: EdgeSide,
    pub start: i32,
    pub end: i32,
    pub length: i32,
    pub edge_tile: Point,
    pub inward_tile: Point,
    pub normal: Point,
    /// Top-down component id of the edge tile, -1 when unresolved.
    pub component_id: i32,
    pub role: EdgeOpeningRole,
}

/// Filter for [`Map::query_edge_openings`]. `-1` bounds are open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeOpeningQuery {
    /// Bitmask of accepted sides; see [`EdgeSide::mask_bit`]. 0 = all sides.
    pub side_mask: u8,
    /// Accepted role as integer, -1 = any.
    pub role: i32,
    pub coord_min: i32,
    pub coord_max: i32,
    pub length_min: i32,
    pub length_max: i32,
    /// Only openings whose component is the largest walkable component.
    pub require_primary_component: i32,
}

impl Default for EdgeOpeningQuery {
    fn default() -> Self {
        EdgeOpeningQuery {
            side_mask: 0,
            role: -1,
            coord_min: 0,
            coord_max: -1,
            length_min: 0,
            length_max: -1,
            require_primary_component: 0,
        }
    }
}

/// Requested border opening, part of [`crate::request::GenerateRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeOpeningSpec {
    pub side: EdgeSide,
    pub start: i32,
    pub end: i32,
    pub role: EdgeOpeningRole,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProcessStepDiagnostics {
    pub method_type: i32,
    pub walkable_before: u64,
    pub walkable_after: u64,
    pub walkable_delta: i64,
    pub components_before: u64,
    pub components_after: u64,
    pub components_delta: i64,
    pub connected_before: i32,
    pub connected_after: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RoomTypeQuotaDiagnostics {
    pub type_id: u32,
    pub enabled: i32,
    pub min_count: i32,
    pub max_count: i32,
    pub target_count: i32,
    pub assigned_count: u64,
    pub min_satisfied: i32,
    pub max_satisfied: i32,
    pub target_satisfied: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationDiagnostics {
    pub process_steps: Vec<ProcessStepDiagnostics>,
    pub typed_room_count: u64,
    pub untyped_room_count: u64,
    pub room_type_min_miss_count: u64,
    pub room_type_max_excess_count: u64,
    pub room_type_target_miss_count: u64,
    pub room_type_quotas: Vec<RoomTypeQuotaDiagnostics>,
}

impl GenerationDiagnostics {
    pub fn clear_process_steps(&mut self) {
        self.process_steps.clear();
    }

    pub fn clear_room_type_quotas(&mut self) {
        self.room_type_quotas.clear();
        self.typed_room_count = 0;
        self.untyped_room_count = 0;
        self.room_type_min_miss_count = 0;
        self.room_type_max_excess_count = 0;
        self.room_type_target_miss_count = 0;
    }
}

/// Self-sufficient snapshot of the request that produced a map. Owns its
/// method list and definition list; enough to replay an equivalent map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestSnapshot {
    pub present: bool,
    pub width: i32,
    pub height: i32,
    pub seed: u64,
    pub algorithm_id: i32,
    pub params: AlgorithmParams,
    /// A disabled process pipeline snapshots as an empty method list.
    pub methods: Vec<ProcessMethod>,
    pub policy: AssignmentPolicy,
    pub definitions: Vec<RoomTypeDefinition>,
}

impl RequestSnapshot {
    /// Product of every SCALE factor in the snapshot's method list.
    pub fn process_scale_factor(&self) -> Result<i32, GenError> {
        let mut factor: u64 = 1;
        for method in &self.methods {
            if let ProcessMethod::Scale { factor: f } = method {
                if *f < 1 {
                    return Err(GenError::InvalidArgument("scale factor below 1 in snapshot"));
                }
                factor *= *f as u64;
                if factor > i32::MAX as u64 {
                    return Err(GenError::GenerationFailed("snapshot scale factor overflow"));
                }
            }
        }
        Ok(factor as i32)
    }

    /// True when any definition references a template map of its own.
    pub fn references_templates(&self) -> bool {
        self.definitions.iter().any(|d| !d.template_map_path.is_empty())
    }
}

#[derive(Debug, Clone, Default)]
pub struct MapMetadata {
    pub rooms: Vec<Room>,
    pub corridors: Vec<Corridor>,
    pub room_adjacency: Vec<AdjacencySpan>,
    pub room_neighbors: Vec<RoomNeighbor>,
    pub room_entrances: Vec<RoomEntrance>,
    pub edge_openings: Vec<EdgeOpening>,

    pub seed: u64,
    pub algorithm_id: i32,
    pub generation_class: GenerationClass,
    pub generation_attempts: u64,
    pub walkable_tile_count: u64,
    pub wall_tile_count: u64,
    pub special_room_count: u64,
    pub entrance_room_count: u64,
    pub exit_room_count: u64,
    pub boss_room_count: u64,
    pub treasure_room_count: u64,
    pub shop_room_count: u64,
    pub leaf_room_count: u64,
    pub corridor_total_length: u64,
    pub entrance_exit_distance: i32,
    pub connected_component_count: u64,
    pub largest_component_size: u64,
    pub connected_floor: bool,
    pub primary_entrance_opening_id: i32,
    pub primary_exit_opening_id: i32,

    pub diagnostics: GenerationDiagnostics,
    pub generation_request: RequestSnapshot,
}

impl Default for GenerationClass {
    fn default() -> Self {
        GenerationClass::Unknown
    }
}

/// Structural equality covers the persisted identity of a map. The derived
/// arenas (entrances, edge openings, primary opening ids) are recomputed
/// during generation and stay empty on loaded maps.
impl PartialEq for MapMetadata {
    fn eq(&self, other: &Self) -> bool {
        self.rooms == other.rooms
            && self.corridors == other.corridors
            && self.room_adjacency == other.room_adjacency
            && self.room_neighbors == other.room_neighbors
            && self.seed == other.seed
            && self.algorithm_id == other.algorithm_id
            && self.generation_class == other.generation_class
            && self.generation_attempts == other.generation_attempts
            && self.walkable_tile_count == other.walkable_tile_count
            && self.wall_tile_count == other.wall_tile_count
            && self.special_room_count == other.special_room_count
            && self.entrance_room_count == other.entrance_room_count
            && self.exit_room_count == other.exit_room_count
            && self.boss_room_count == other.boss_room_count
            && self.treasure_room_count == other.treasure_room_count
            && self.shop_room_count == other.shop_room_count
            && self.leaf_room_count == other.leaf_room_count
            && self.corridor_total_length == other.corridor_total_length
            && self.entrance_exit_distance == other.entrance_exit_distance
            && self.connected_component_count == other.connected_component_count
            && self.largest_component_size == other.largest_component_size
            && self.connected_floor == other.connected_floor
            && self.diagnostics == other.diagnostics
            && self.generation_request == other.generation_request
    }
}

impl MapMetadata {
    pub fn new() -> Self {
        MapMetadata {
            algorithm_id: -1,
            entrance_exit_distance: -1,
            primary_entrance_opening_id: -1,
            primary_exit_opening_id: -1,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Map {
    width: i32,
    height: i32,
    tiles: Vec<Tile>,
    pub metadata: MapMetadata,
}

impl Map {
    /// Allocates the grid and seeds every tile to `fill`. All metadata
    /// arenas start empty.
    pub fn new(width: i32, height: i32, fill: Tile) -> Result<Map, GenError> {
        if width < 1 || height < 1 {
            return Err(GenError::InvalidArgument("map dimensions must be at least 1x1"));
        }
        let cell_count = (width as u64)
            .checked_mul(height as u64)
            .filter(|&count| count <= usize::MAX as u64)
            .ok_or(GenError::AllocationFailed("tile count overflows platform size"))?;

        Ok(Map {
            width,
            height,
            tiles: vec![fill; cell_count as usize],
            metadata: MapMetadata::new(),
        })
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    pub fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && x < self.width && y < self.height
    }

    pub fn tile_index(&self, x: i32, y: i32) -> usize {
        (y as usize) * (self.width as usize) + (x as usize)
    }

    /// Out-of-bounds reads return `Void`; it is only legal outside the grid.
    pub fn get_tile(&self, x: i32, y: i32) -> Tile {
        if !self.in_bounds(x, y) {
            return Tile::Void;
        }
        self.tiles[self.tile_index(x, y)]
    }

    pub fn set_tile(&mut self, x: i32, y: i32, tile: Tile) {
        if self.in_bounds(x, y) {
            let index = self.tile_index(x, y);
            self.tiles[index] = tile;
        }
    }

    pub fn set_tile_at(&mut self, index: usize, tile: Tile) {
        self.tiles[index] = tile;
    }

    pub fn fill(&mut self, tile: Tile) {
        self.tiles.fill(tile);
    }

    /// Replaces the tile grid wholesale (post-process scaling).
    pub fn replace_tiles(&mut self, width: i32, height: i32, tiles: Vec<Tile>) {
        debug_assert_eq!(tiles.len(), width as usize * height as usize);
        self.width = width;
        self.height = height;
        self.tiles = tiles;
    }

    pub fn count_walkable(&self) -> u64 {
        self.tiles.iter().filter(|t| t.is_walkable()).count() as u64
    }

    pub fn is_walkable(&self, x: i32, y: i32) -> bool {
        self.get_tile(x, y).is_walkable()
    }

    /// Appends a room and returns its dense id.
    pub fn add_room(&mut self, bounds: Rect, flags: u32) -> Result<i32, GenError> {
        if !bounds.is_valid() {
            return Err(GenError::InvalidArgument("room bounds must have positive extent"));
        }
        let id = i32::try_from(self.metadata.rooms.len())
            .map_err(|_| GenError::AllocationFailed("room arena exceeds i32 indices"))?;
        self.metadata.rooms.push(Room {
            id,
            bounds,
            flags,
            role: RoomRole::None,
            type_id: ROOM_TYPE_UNASSIGNED,
        });
        Ok(id)
    }

    /// Appends a corridor record. The adjacency index is not updated here;
    /// the orchestrator recomputes it wholesale.
    pub fn add_corridor(
        &mut self,
        from_room_id: i32,
        to_room_id: i32,
        width: i32,
        length: i32,
    ) -> Result<(), GenError> {
        let room_count = self.metadata.rooms.len();
        if from_room_id < 0
            || to_room_id < 0
            || from_room_id as usize >= room_count
            || to_room_id as usize >= room_count
            || from_room_id == to_room_id
        {
            return Err(GenError::InvalidArgument("corridor endpoints must be distinct valid rooms"));
        }
        if width <= 0 || length <= 0 {
            return Err(GenError::InvalidArgument("corridor width and length must be positive"));
        }
        self.metadata.corridors.push(Corridor {
            from_room_id,
            to_room_id,
            width,
            length,
        });
        Ok(())
    }

    /// Drops all metadata but keeps the grid.
    pub fn clear_metadata(&mut self) {
        self.metadata = MapMetadata::new();
    }

    pub fn point_in_any_room(&self, x: i32, y: i32) -> bool {
        self.metadata.rooms.iter().any(|r| r.bounds.contains(x, y))
    }

    /// Returns openings matching the filter, in id order.
    pub fn query_edge_openings(&self, query: &EdgeOpeningQuery) -> Vec<&EdgeOpening> {
        let primary_component = self.primary_component_id();
        self.metadata
            .edge_openings
            .iter()
            .filter(|opening| {
                if query.side_mask != 0 && (query.side_mask & opening.side.mask_bit()) == 0 {
                    return false;
                }
                if query.role >= 0 && opening.role as i32 != query.role {
                    return false;
                }
                if opening.start < query.coord_min {
                    return false;
                }
                if query.coord_max >= 0 && opening.end > query.coord_max {
                    return false;
                }
                if opening.length < query.length_min {
                    return false;
                }
                if query.length_max >= 0 && opening.length > query.length_max {
                    return false;
                }
                if query.require_primary_component != 0
                    && (opening.component_id < 0 || opening.component_id != primary_component)
                {
                    return false;
                }
                true
            })
            .collect()
    }

    /// Component id holding the most opening tiles, -1 when unknown.
    fn primary_component_id(&self) -> i32 {
        let mut best = -1;
        let mut best_size: u64 = 0;
        let mut sizes: Vec<(i32, u64)> = Vec::new();
        for opening in &self.metadata.edge_openings {
            if opening.component_id < 0 {
                continue;
            }
            match sizes.iter_mut().find(|(id, _)| *id == opening.component_id) {
                Some((_, size)) => *size += opening.length as u64,
                None => sizes.push((opening.component_id, opening.length as u64)),
            }
        }
        for (id, size) in sizes {
            if size > best_size {
                best_size = size;
                best = id;
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_map_is_seeded_and_empty() {
        let map = Map::new(4, 3, Tile::Wall).unwrap();
        assert_eq!(map.tile_count(), 12);
        assert!(map.tiles().iter().all(|&t| t == Tile::Wall));
        assert!(map.metadata.rooms.is_empty());
        assert_eq!(map.metadata.algorithm_id, -1);
    }

    #[test]
    fn test_rejects_degenerate_dimensions() {
        assert!(Map::new(0, 5, Tile::Wall).is_err());
        assert!(Map::new(5, -1, Tile::Wall).is_err());
    }

    #[test]
    fn test_out_of_bounds_reads_void() {
        let map = Map::new(4, 4, Tile::Floor).unwrap();
        assert_eq!(map.get_tile(-1, 0), Tile::Void);
        assert_eq!(map.get_tile(4, 0), Tile::Void);
    }

    #[test]
    fn test_add_room_assigns_dense_ids() {
        let mut map = Map::new(10, 10, Tile::Wall).unwrap();
        let a = map.add_room(Rect::new(1, 1, 3, 3), ROOM_FLAG_NONE).unwrap();
        let b = map.add_room(Rect::new(5, 5, 3, 3), ROOM_FLAG_SPECIAL).unwrap();
        assert_eq!((a, b), (0, 1));
        assert_eq!(map.metadata.rooms[1].flags, ROOM_FLAG_SPECIAL);
        assert_eq!(map.metadata.rooms[0].type_id, ROOM_TYPE_UNASSIGNED);
    }

    #[test]
    fn test_add_corridor_validates_endpoints() {
        let mut map = Map::new(10, 10, Tile::Wall).unwrap();
        map.add_room(Rect::new(1, 1, 3, 3), ROOM_FLAG_NONE).unwrap();
        map.add_room(Rect::new(5, 5, 3, 3), ROOM_FLAG_NONE).unwrap();
        assert!(map.add_corridor(0, 1, 1, 4).is_ok());
        assert!(map.add_corridor(0, 0, 1, 4).is_err());
        assert!(map.add_corridor(0, 2, 1, 4).is_err());
        assert!(map.add_corridor(0, 1, 0, 4).is_err());
    }

    #[test]
    fn test_clear_metadata_keeps_grid() {
        let mut map = Map::new(6, 6, Tile::Floor).unwrap();
        map.add_room(Rect::new(1, 1, 2, 2), ROOM_FLAG_NONE).unwrap();
        map.clear_metadata();
        assert!(map.metadata.rooms.is_empty());
        assert_eq!(map.get_tile(3, 3), Tile::Floor);
    }

    #[test]
    fn test_query_edge_openings_filters() {
        let mut map = Map::new(10, 10, Tile::Wall).unwrap();
        map.metadata.edge_openings = vec![
            EdgeOpening {
                id: 0,
                side: EdgeSide::Top,
                start: 2,
                end: 4,
                length: 3,
                edge_tile: Point::new(3, 0),
                inward_tile: Point::new(3, 1),
                normal: Point::new(0, 1),
                component_id: 0,
                role: EdgeOpeningRole::Entrance,
            },
            EdgeOpening {
                id: 1,
                side: EdgeSide::Left,
                start: 5,
                end: 5,
                length: 1,
                edge_tile: Point::new(0, 5),
                inward_tile: Point::new(1, 5),
                normal: Point::new(1, 0),
                component_id: 0,
                role: EdgeOpeningRole::None,
            },
        ];

        let all = map.query_edge_openings(&EdgeOpeningQuery::default());
        assert_eq!(all.len(), 2);

        let top_only = map.query_edge_openings(&EdgeOpeningQuery {
            side_mask: EdgeSide::Top.mask_bit(),
            ..Default::default()
        });
        assert_eq!(top_only.len(), 1);
        assert_eq!(top_only[0].id, 0);

        let long_only = map.query_edge_openings(&EdgeOpeningQuery {
            length_min: 2,
            ..Default::default()
        });
        assert_eq!(long_only.len(), 1);

        let entrances = map.query_edge_openings(&EdgeOpeningQuery {
            role: EdgeOpeningRole::Entrance as i32,
            ..Default::default()
        });
        assert_eq!(entrances.len(), 1);
    }

    #[test]
    fn test_clone_is_deep() {
        let mut map = Map::new(5, 5, Tile::Wall).unwrap();
        map.add_room(Rect::new(1, 1, 2, 2), ROOM_FLAG_NONE).unwrap();
        let mut copy = map.clone();
        copy.set_tile(0, 0, Tile::Floor);
        copy.metadata.rooms[0].flags = ROOM_FLAG_SPECIAL;
        assert_eq!(map.get_tile(0, 0), Tile::Wall);
        assert_eq!(map.metadata.rooms[0].flags, ROOM_FLAG_NONE);
    }
}
