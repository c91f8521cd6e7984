//! Shared geometry primitives: rectangle algebra, bounded brushes and
//! carving helpers. Carving writes tiles only; nothing here allocates.

use serde::{Deserialize, Serialize};

use crate::map::{Map, Tile};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Point { x, y }
    }
}

/// Axis-aligned rectangle, half-open on the high edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Rect { x, y, width, height }
    }

    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    pub fn area(&self) -> i64 {
        i64::from(self.width) * i64::from(self.height)
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x && y >= self.y && x < self.x + self.width && y < self.y + self.height
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2, self.y + self.height / 2)
    }

    pub fn overlaps(&self, other: &Rect) -> bool {
        let a_right = i64::from(self.x) + i64::from(self.width);
        let a_bottom = i64::from(self.y) + i64::from(self.height);
        let b_right = i64::from(other.x) + i64::from(other.width);
        let b_bottom = i64::from(other.y) + i64::from(other.height);

        if a_right <= i64::from(other.x) || b_right <= i64::from(self.x) {
            return false;
        }
        if a_bottom <= i64::from(other.y) || b_bottom <= i64::from(self.y) {
            return false;
        }
        true
    }

    pub fn overlaps_with_padding(&self, other: &Rect, padding: i32) -> bool {
        let expanded = Rect {
            x: self.x - padding,
            y: self.y - padding,
            width: self.width + padding * 2,
            height: self.height + padding * 2,
        };
        expanded.overlaps(other)
    }

    /// Intersects the rectangle with the map bounds. Returns the clamped
    /// `[x0, x1) x [y0, y1)` region, or `None` when nothing overlaps.
    pub fn clamp_to_map(&self, map: &Map) -> Option<(i32, i32, i32, i32)> {
        if !self.is_valid() {
            return None;
        }

        let x1 = i64::from(self.x) + i64::from(self.width);
        let y1 = i64::from(self.y) + i64::from(self.height);
        if x1 <= 0 || y1 <= 0 {
            return None;
        }
        if i64::from(self.x) >= i64::from(map.width()) || i64::from(self.y) >= i64::from(map.height()) {
            return None;
        }

        let x0 = self.x.max(0);
        let y0 = self.y.max(0);
        let x1 = (x1.min(i64::from(map.width()))) as i32;
        let y1 = (y1.min(i64::from(map.height()))) as i32;
        if x0 >= x1 || y0 >= y1 {
            return None;
        }
        Some((x0, y0, x1, y1))
    }
}

/// The four cardinal steps in scan order: east, west, south, north.
pub const CARDINALS: [(i32, i32); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];

pub fn paint_outer_walls(map: &mut Map) {
    let (w, h) = (map.width(), map.height());
    for x in 0..w {
        map.set_tile(x, 0, Tile::Wall);
        map.set_tile(x, h - 1, Tile::Wall);
    }
    for y in 0..h {
        map.set_tile(0, y, Tile::Wall);
        map.set_tile(w - 1, y, Tile::Wall);
    }
}

pub fn has_outer_walls(map: &Map) -> bool {
    let (w, h) = (map.width(), map.height());
    for x in 0..w {
        if map.get_tile(x, 0) != Tile::Wall || map.get_tile(x, h - 1) != Tile::Wall {
            return false;
        }
    }
    for y in 0..h {
        if map.get_tile(0, y) != Tile::Wall || map.get_tile(w - 1, y) != Tile::Wall {
            return false;
        }
    }
    true
}

/// Euclidean disc brush; a radius of 0 writes the single center tile.
pub fn carve_brush(map: &mut Map, cx: i32, cy: i32, radius: i32, tile: Tile) {
    let radius = radius.max(0);
    let radius_sq = radius * radius;
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            if dx * dx + dy * dy > radius_sq {
                continue;
            }
            let nx = cx + dx;
            let ny = cy + dy;
            if map.in_bounds(nx, ny) {
                map.set_tile(nx, ny, tile);
            }
        }
    }
}

pub fn carve_rect(map: &mut Map, rect: &Rect) {
    for y in rect.y..rect.y + rect.height {
        for x in rect.x..rect.x + rect.width {
            if map.in_bounds(x, y) {
                map.set_tile(x, y, Tile::Floor);
            }
        }
    }
}

pub fn carve_horizontal(map: &mut Map, x0: i32, x1: i32, y: i32, corridor_width: i32) {
    let radius = corridor_width / 2;
    for x in x0.min(x1)..=x0.max(x1) {
        carve_brush(map, x, y, radius, Tile::Floor);
    }
}

pub fn carve_vertical(map: &mut Map, x: i32, y0: i32, y1: i32, corridor_width: i32) {
    let radius = corridor_width / 2;
    for y in y0.min(y1)..=y0.max(y1) {
        carve_brush(map, x, y, radius, Tile::Floor);
    }
}

/// L-shaped carve between two points; `horizontal_first` picks the elbow.
pub fn carve_l_path(map: &mut Map, a: Point, b: Point, corridor_width: i32, horizontal_first: bool) {
    if horizontal_first {
        carve_horizontal(map, a.x, b.x, a.y, corridor_width);
        carve_vertical(map, b.x, a.y, b.y, corridor_width);
    } else {
        carve_vertical(map, a.x, a.y, b.y, corridor_width);
        carve_horizontal(map, a.x, b.x, b.y, corridor_width);
    }
}

/// Straight axis-aligned (or diagonal-stepped) segment carve.
pub fn carve_segment(map: &mut Map, x0: i32, y0: i32, x1: i32, y1: i32) {
    let x_step = (x1 - x0).signum();
    let y_step = (y1 - y0).signum();
    let mut x = x0;
    let mut y = y0;
    loop {
        if map.in_bounds(x, y) {
            map.set_tile(x, y, Tile::Floor);
        }
        if x == x1 && y == y1 {
            break;
        }
        x += x_step;
        y += y_step;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overlap_is_half_open() {
        let a = Rect::new(0, 0, 4, 4);
        let touching = Rect::new(4, 0, 4, 4);
        let overlapping = Rect::new(3, 3, 4, 4);
        assert!(!a.overlaps(&touching));
        assert!(a.overlaps(&overlapping));
    }

    #[test]
    fn test_padded_overlap_catches_adjacency() {
        let a = Rect::new(0, 0, 4, 4);
        let adjacent = Rect::new(4, 0, 4, 4);
        assert!(a.overlaps_with_padding(&adjacent, 1));
        let spaced = Rect::new(5, 0, 4, 4);
        assert!(!a.overlaps_with_padding(&spaced, 1));
    }

    #[test]
    fn test_clamp_to_map() {
        let map = Map::new(10, 10, Tile::Wall).unwrap();
        let r = Rect::new(-2, -2, 5, 5);
        assert_eq!(r.clamp_to_map(&map), Some((0, 0, 3, 3)));
        let outside = Rect::new(20, 20, 3, 3);
        assert_eq!(outside.clamp_to_map(&map), None);
    }

    #[test]
    fn test_brush_radius_zero_is_single_tile() {
        let mut map = Map::new(9, 9, Tile::Wall).unwrap();
        carve_brush(&mut map, 4, 4, 0, Tile::Floor);
        assert_eq!(map.count_walkable(), 1);
        assert_eq!(map.get_tile(4, 4), Tile::Floor);
    }

    #[test]
    fn test_brush_is_euclidean() {
        let mut map = Map::new(9, 9, Tile::Wall).unwrap();
        carve_brush(&mut map, 4, 4, 2, Tile::Floor);
        // Corners at distance sqrt(8) > 2 stay wall.
        assert_eq!(map.get_tile(2, 2), Tile::Wall);
        assert_eq!(map.get_tile(4, 2), Tile::Floor);
        assert_eq!(map.get_tile(6, 4), Tile::Floor);
    }

    #[test]
    fn test_outer_walls_roundtrip() {
        let mut map = Map::new(8, 8, Tile::Floor).unwrap();
        assert!(!has_outer_walls(&map));
        paint_outer_walls(&mut map);
        assert!(has_outer_walls(&map));
        assert_eq!(map.get_tile(3, 3), Tile::Floor);
    }
}
