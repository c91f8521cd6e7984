//! Flood-fill connectivity over walkable tiles.
//!
//! Two graph perspectives are supported: top-down (4-neighborhood between
//! walkable tiles) and side-view grounded (standable tiles linked by bounded
//! jump/drop segments). Tie-breaking is stable: when component sizes tie,
//! the first component discovered in row-major order wins.

use serde::{Deserialize, Serialize};

use crate::error::GenError;
use crate::geometry::CARDINALS;
use crate::map::{Map, Tile};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConnectivityStats {
    pub walkable_count: u64,
    pub component_count: u64,
    pub largest_component_size: u64,
    pub connected_floor: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i32)]
pub enum Perspective {
    TopDown = 0,
    SideView = 1,
}

/// Movement envelope for the side-view grounded graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraversalConstraints {
    pub max_jump_up: i32,
    pub max_jump_across: i32,
    pub max_drop_down: i32,
    pub require_grounded_connectivity: i32,
}

impl Default for TraversalConstraints {
    fn default() -> Self {
        TraversalConstraints {
            max_jump_up: 2,
            max_jump_across: 3,
            max_drop_down: 4,
            require_grounded_connectivity: 1,
        }
    }
}

impl TraversalConstraints {
    fn validate(&self) -> Result<(), GenError> {
        if self.max_jump_up < 0 || self.max_jump_across < 0 || self.max_drop_down < 0 {
            return Err(GenError::InvalidArgument("traversal distances must be nonnegative"));
        }
        if self.require_grounded_connectivity != 0 && self.require_grounded_connectivity != 1 {
            return Err(GenError::InvalidArgument("require_grounded_connectivity must be 0 or 1"));
        }
        Ok(())
    }
}

/// Labels every walkable tile with a component id in discovery (row-major)
/// order. Returns the label grid (-1 for non-walkable) plus per-component
/// sizes.
pub fn label_components(map: &Map) -> (Vec<i32>, Vec<u64>) {
    let cell_count = map.tile_count();
    let width = map.width();
    let mut labels = vec![-1i32; cell_count];
    let mut sizes: Vec<u64> = Vec::new();
    let mut queue: Vec<usize> = Vec::with_capacity(cell_count);
    let tiles = map.tiles();

    for start in 0..cell_count {
        if labels[start] >= 0 || !tiles[start].is_walkable() {
            continue;
        }

        let component = sizes.len() as i32;
        let mut size: u64 = 0;
        queue.clear();
        queue.push(start);
        labels[start] = component;

        let mut head = 0;
        while head < queue.len() {
            let current = queue[head];
            head += 1;
            size += 1;

            let x = (current % width as usize) as i32;
            let y = (current / width as usize) as i32;
            for (dx, dy) in CARDINALS {
                let nx = x + dx;
                let ny = y + dy;
                if !map.in_bounds(nx, ny) {
                    continue;
                }
                let index = map.tile_index(nx, ny);
                if labels[index] >= 0 || !tiles[index].is_walkable() {
                    continue;
                }
                labels[index] = component;
                queue.push(index);
            }
        }
        sizes.push(size);
    }

    (labels, sizes)
}

fn analyze_top_down(map: &Map) -> ConnectivityStats {
    let (_, sizes) = label_components(map);
    let walkable_count: u64 = sizes.iter().sum();
    let largest = sizes.iter().copied().max().unwrap_or(0);
    ConnectivityStats {
        walkable_count,
        component_count: sizes.len() as u64,
        largest_component_size: largest,
        connected_floor: walkable_count > 0 && sizes.len() == 1,
    }
}

/// Breadth-first connectivity stats under the requested perspective.
pub fn analyze_connectivity(
    map: &Map,
    perspective: Perspective,
    traversal: Option<&TraversalConstraints>,
) -> Result<ConnectivityStats, GenError> {
    match perspective {
        Perspective::TopDown => Ok(analyze_top_down(map)),
        Perspective::SideView => {
            let traversal =
                traversal.ok_or(GenError::InvalidArgument("side view requires traversal constraints"))?;
            traversal.validate()?;
            if traversal.require_grounded_connectivity == 0 {
                return Ok(analyze_top_down(map));
            }
            let grounded = GroundedGraph::build(map, traversal);
            Ok(grounded.stats())
        }
    }
}

/// Top-down stats without a perspective argument; the common internal case.
pub fn analyze_top_down_connectivity(map: &Map) -> ConnectivityStats {
    analyze_top_down(map)
}

/// Retains the largest top-down component and walls off every other walkable
/// tile. Ties resolve to the first component found in row-major order.
pub fn enforce_single_connected_region(map: &mut Map) {
    let (labels, sizes) = label_components(map);
    if sizes.len() <= 1 {
        return;
    }

    let mut keep = 0usize;
    for (i, &size) in sizes.iter().enumerate() {
        if size > sizes[keep] {
            keep = i;
        }
    }

    for (index, label) in labels.iter().enumerate() {
        if *label >= 0 && *label != keep as i32 {
            map.set_tile_at(index, Tile::Wall);
        }
    }
}

/// Side-view grounded component graph over standable tiles.
struct GroundedGraph {
    /// Tile index of every standable node, in row-major order.
    node_tiles: Vec<usize>,
    /// Component id per node.
    node_components: Vec<i32>,
    component_sizes: Vec<u64>,
}

impl GroundedGraph {
    fn build(map: &Map, traversal: &TraversalConstraints) -> GroundedGraph {
        let cell_count = map.tile_count();
        let width = map.width() as usize;
        let tiles = map.tiles();

        let walkable: Vec<bool> = tiles.iter().map(|t| t.is_walkable()).collect();
        let mut node_ids = vec![-1i32; cell_count];
        let mut node_tiles: Vec<usize> = Vec::new();

        for index in 0..cell_count {
            let x = (index % width) as i32;
            let y = (index / width) as i32;
            if !is_standable(map, &walkable, x, y) {
                continue;
            }
            node_ids[index] = node_tiles.len() as i32;
            node_tiles.push(index);
        }

        let max_jump_across = traversal.max_jump_across.min(map.width() - 1);
        let max_jump_up = traversal.max_jump_up.min(map.height() - 1);
        let max_drop_down = traversal.max_drop_down.min(map.height() - 1);

        let mut node_components = vec![-1i32; node_tiles.len()];
        let mut component_sizes: Vec<u64> = Vec::new();
        let mut queue: Vec<usize> = Vec::new();

        for start in 0..node_tiles.len() {
            if node_components[start] >= 0 {
                continue;
            }
            let component = component_sizes.len() as i32;
            let mut size: u64 = 0;
            queue.clear();
            queue.push(start);
            node_components[start] = component;

            let mut head = 0;
            while head < queue.len() {
                let node = queue[head];
                head += 1;
                size += 1;

                let tile_index = node_tiles[node];
                let sx = (tile_index % width) as i32;
                let sy = (tile_index / width) as i32;

                let min_x = (sx - max_jump_across).max(0);
                let max_x = (sx + max_jump_across).min(map.width() - 1);
                let min_y = (sy - max_jump_up).max(0);
                let max_y = (sy + max_drop_down).min(map.height() - 1);

                for ty in min_y..=max_y {
                    for tx in min_x..=max_x {
                        if tx == sx && ty == sy {
                            continue;
                        }
                        let target_index = ty as usize * width + tx as usize;
                        let target_node = node_ids[target_index];
                        if target_node < 0 || node_components[target_node as usize] >= 0 {
                            continue;
                        }
                        if !nodes_linked(map, &walkable, sx, sy, tx, ty, traversal) {
                            continue;
                        }
                        node_components[target_node as usize] = component;
                        queue.push(target_node as usize);
                    }
                }
            }
            component_sizes.push(size);
        }

        GroundedGraph {
            node_tiles,
            node_components,
            component_sizes,
        }
    }

    fn stats(&self) -> ConnectivityStats {
        let walkable_count = self.node_tiles.len() as u64;
        let largest = self.component_sizes.iter().copied().max().unwrap_or(0);
        ConnectivityStats {
            walkable_count,
            component_count: self.component_sizes.len() as u64,
            largest_component_size: largest,
            connected_floor: walkable_count > 0 && self.component_sizes.len() == 1,
        }
    }

    /// First-discovered wins on ties: only a strictly larger size replaces.
    fn largest_component(&self) -> Option<i32> {
        let mut winner = None;
        let mut winner_size = 0u64;
        for (id, &size) in self.component_sizes.iter().enumerate() {
            if size > winner_size {
                winner_size = size;
                winner = Some(id as i32);
            }
        }
        winner
    }
}

fn is_standable(map: &Map, walkable: &[bool], x: i32, y: i32) -> bool {
    if !map.in_bounds(x, y) {
        return false;
    }
    if !walkable[map.tile_index(x, y)] {
        return false;
    }
    if y + 1 >= map.height() {
        return true;
    }
    !walkable[map.tile_index(x, y + 1)]
}

/// Bresenham segment check: every cell along the line must be walkable.
fn line_is_clear(map: &Map, walkable: &[bool], x0: i32, y0: i32, x1: i32, y1: i32) -> bool {
    let dx = (x1 - x0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let dy = -(y1 - y0).abs();
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;
    let mut x = x0;
    let mut y = y0;

    loop {
        if !map.in_bounds(x, y) || !walkable[map.tile_index(x, y)] {
            return false;
        }
        if x == x1 && y == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
    }
    true
}

fn can_move_one_way(
    map: &Map,
    walkable: &[bool],
    sx: i32,
    sy: i32,
    tx: i32,
    ty: i32,
    traversal: &TraversalConstraints,
) -> bool {
    let dx = (tx - sx).abs();
    let dy = ty - sy;

    if dx > traversal.max_jump_across {
        return false;
    }
    if dy < 0 && -dy > traversal.max_jump_up {
        return false;
    }
    if dy > 0 && dy > traversal.max_drop_down {
        return false;
    }
    line_is_clear(map, walkable, sx, sy, tx, ty)
}

/// Connectivity is the symmetric closure of one-way reachability.
fn nodes_linked(
    map: &Map,
    walkable: &[bool],
    sx: i32,
    sy: i32,
    tx: i32,
    ty: i32,
    traversal: &TraversalConstraints,
) -> bool {
    if sx == tx && sy == ty {
        return true;
    }
    can_move_one_way(map, walkable, sx, sy, tx, ty, traversal)
        || can_move_one_way(map, walkable, tx, ty, sx, sy, traversal)
}

/// Retains the largest grounded component. Every walkable tile whose
/// column-fall destination (first standable tile at or below it in its
/// column) lies outside the winner is rewritten to WALL.
pub fn enforce_side_view_grounded_connectivity(
    map: &mut Map,
    traversal: &TraversalConstraints,
) -> Result<(), GenError> {
    traversal.validate()?;
    if traversal.require_grounded_connectivity == 0 {
        return Ok(());
    }

    let grounded = GroundedGraph::build(map, traversal);
    if grounded.component_sizes.len() <= 1 {
        return Ok(());
    }
    let Some(winner) = grounded.largest_component() else {
        return Ok(());
    };

    let cell_count = map.tile_count();
    let width = map.width() as usize;
    let walkable: Vec<bool> = map.tiles().iter().map(|t| t.is_walkable()).collect();

    let mut standable_component = vec![-1i32; cell_count];
    for (node, &tile_index) in grounded.node_tiles.iter().enumerate() {
        standable_component[tile_index] = grounded.node_components[node];
    }

    // Walking a column bottom-up, each walkable tile inherits the component
    // of the standable tile it would fall onto.
    let mut fall_component = vec![-1i32; cell_count];
    for x in 0..map.width() {
        let mut current = -1i32;
        for y in (0..map.height()).rev() {
            let index = y as usize * width + x as usize;
            if !walkable[index] {
                current = -1;
                fall_component[index] = -1;
                continue;
            }
            if standable_component[index] >= 0 {
                current = standable_component[index];
            }
            fall_component[index] = current;
        }
    }

    for index in 0..cell_count {
        if walkable[index] && fall_component[index] != winner {
            map.set_tile_at(index, Tile::Wall);
        }
    }
    Ok(())
}

/// Eight-neighborhood majority smoothing used by the organic cave carver:
/// five or more walkable neighbors opens a cell, two or fewer closes it.
pub fn smooth_walkable_regions(map: &mut Map, smoothing_passes: i32) {
    if smoothing_passes <= 0 {
        return;
    }

    let width = map.width();
    let height = map.height();
    for _ in 0..smoothing_passes {
        let mut buffer = map.tiles().to_vec();
        for y in 1..height - 1 {
            for x in 1..width - 1 {
                let mut neighbors = 0;
                for dy in -1..=1 {
                    for dx in -1..=1 {
                        if dx == 0 && dy == 0 {
                            continue;
                        }
                        if map.is_walkable(x + dx, y + dy) {
                            neighbors += 1;
                        }
                    }
                }
                let index = map.tile_index(x, y);
                if neighbors >= 5 {
                    buffer[index] = Tile::Floor;
                } else if neighbors <= 2 {
                    buffer[index] = Tile::Wall;
                }
            }
        }
        map.replace_tiles(width, height, buffer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map_from_rows(rows: &[&str]) -> Map {
        let height = rows.len() as i32;
        let width = rows[0].len() as i32;
        let mut map = Map::new(width, height, Tile::Wall).unwrap();
        for (y, row) in rows.iter().enumerate() {
            for (x, c) in row.chars().enumerate() {
                let tile = match c {
                    '.' => Tile::Floor,
                    '+' => Tile::Door,
                    _ => Tile::Wall,
                };
                map.set_tile(x as i32, y as i32, tile);
            }
        }
        map
    }

    #[test]
    fn test_top_down_counts_components() {
        let map = map_from_rows(&[
            "#####",
            "#..##",
            "#####",
            "##..#",
            "#####",
        ]);
        let stats = analyze_connectivity(&map, Perspective::TopDown, None).unwrap();
        assert_eq!(stats.walkable_count, 4);
        assert_eq!(stats.component_count, 2);
        assert_eq!(stats.largest_component_size, 2);
        assert!(!stats.connected_floor);
    }

    #[test]
    fn test_doors_are_walkable() {
        let map = map_from_rows(&["#.+.#"]);
        let stats = analyze_connectivity(&map, Perspective::TopDown, None).unwrap();
        assert_eq!(stats.component_count, 1);
        assert_eq!(stats.walkable_count, 3);
        assert!(stats.connected_floor);
    }

    #[test]
    fn test_enforce_single_region_keeps_largest() {
        let mut map = map_from_rows(&[
            "#######",
            "#...#.#",
            "#######",
        ]);
        enforce_single_connected_region(&mut map);
        let stats = analyze_top_down_connectivity(&map);
        assert_eq!(stats.component_count, 1);
        assert_eq!(stats.walkable_count, 3);
        assert_eq!(map.get_tile(5, 1), Tile::Wall);
    }

    #[test]
    fn test_enforce_single_region_tie_keeps_first_row_major() {
        let mut map = map_from_rows(&[
            "#####",
            "#.#.#",
            "#####",
        ]);
        enforce_single_connected_region(&mut map);
        assert_eq!(map.get_tile(1, 1), Tile::Floor);
        assert_eq!(map.get_tile(3, 1), Tile::Wall);
    }

    #[test]
    fn test_side_view_links_across_gap() {
        // Two floor ledges separated by a 2-wide pit, both standable on the
        // bottom row; the jump-across budget decides whether they connect.
        let map = map_from_rows(&[
            "......",
            "##..##",
        ]);
        let near = TraversalConstraints {
            max_jump_across: 3,
            ..Default::default()
        };
        let stats = analyze_connectivity(&map, Perspective::SideView, Some(&near)).unwrap();
        assert_eq!(stats.component_count, 1);

        let strict = TraversalConstraints {
            max_jump_up: 0,
            max_jump_across: 0,
            max_drop_down: 0,
            require_grounded_connectivity: 1,
        };
        let stats = analyze_connectivity(&map, Perspective::SideView, Some(&strict)).unwrap();
        assert!(stats.component_count > 1);
    }

    #[test]
    fn test_side_view_retention_removes_unreachable_ledge() {
        let mut map = map_from_rows(&[
            "#....#",
            "######",
            "#.##.#",
            "######",
        ]);
        let traversal = TraversalConstraints {
            max_jump_up: 0,
            max_jump_across: 1,
            max_drop_down: 0,
            require_grounded_connectivity: 1,
        };
        enforce_side_view_grounded_connectivity(&mut map, &traversal).unwrap();
        // The top ledge (4 tiles) survives; the two isolated cells go.
        assert_eq!(map.get_tile(1, 0), Tile::Floor);
        assert_eq!(map.get_tile(1, 2), Tile::Wall);
        assert_eq!(map.get_tile(4, 2), Tile::Wall);
    }

    #[test]
    fn test_smoothing_fills_pockets() {
        let mut map = map_from_rows(&[
            "#####",
            "#.#.#",
            "#...#",
            "#...#",
            "#####",
        ]);
        smooth_walkable_regions(&mut map, 1);
        // The lone wall surrounded by floor opens up.
        assert_eq!(map.get_tile(2, 1), Tile::Floor);
    }

    #[test]
    fn test_side_view_rejects_negative_budgets() {
        let map = map_from_rows(&["..", "##"]);
        let bad = TraversalConstraints {
            max_jump_up: -1,
            ..Default::default()
        };
        assert!(analyze_connectivity(&map, Perspective::SideView, Some(&bad)).is_err());
    }
}
