//! Binary space partition: random leaf splits down to a target count, one
//! room per leaf, in-order pairwise connection of the tree.

use crate::error::GenError;
use crate::generators::l_path_length;
use crate::geometry::{carve_l_path, carve_rect, Rect};
use crate::map::{Map, Tile, ROOM_FLAG_NONE};
use crate::request::{AlgorithmParams, BspConfig, GenerateRequest};
use crate::rng::Rng;

struct BspNode {
    bounds: Rect,
    left: i32,
    right: i32,
    room_id: i32,
    is_leaf: bool,
}

impl BspNode {
    fn leaf(bounds: Rect) -> Self {
        BspNode {
            bounds,
            left: -1,
            right: -1,
            room_id: -1,
            is_leaf: true,
        }
    }

    fn can_split(&self, min_leaf: i32) -> bool {
        self.bounds.width >= min_leaf * 2 || self.bounds.height >= min_leaf * 2
    }
}

fn split_leaf(nodes: &mut Vec<BspNode>, leaf_index: usize, min_leaf: i32, rng: &mut Rng) {
    let bounds = nodes[leaf_index].bounds;
    let can_vertical = bounds.width >= min_leaf * 2;
    let can_horizontal = bounds.height >= min_leaf * 2;

    // Split the longer axis; exact ties flip a coin.
    let split_vertical = if can_vertical && can_horizontal {
        if bounds.width > bounds.height {
            true
        } else if bounds.height > bounds.width {
            false
        } else {
            rng.coin_flip()
        }
    } else {
        can_vertical
    };

    let (left, right) = if split_vertical {
        let min_split = bounds.x + min_leaf;
        let max_split = bounds.x + bounds.width - min_leaf;
        let split = rng.range(min_split, max_split);
        (
            Rect::new(bounds.x, bounds.y, split - bounds.x, bounds.height),
            Rect::new(split, bounds.y, bounds.x + bounds.width - split, bounds.height),
        )
    } else {
        let min_split = bounds.y + min_leaf;
        let max_split = bounds.y + bounds.height - min_leaf;
        let split = rng.range(min_split, max_split);
        (
            Rect::new(bounds.x, bounds.y, bounds.width, split - bounds.y),
            Rect::new(bounds.x, split, bounds.width, bounds.y + bounds.height - split),
        )
    };

    let left_index = nodes.len() as i32;
    nodes.push(BspNode::leaf(left));
    nodes.push(BspNode::leaf(right));
    nodes[leaf_index].left = left_index;
    nodes[leaf_index].right = left_index + 1;
    nodes[leaf_index].is_leaf = false;
}

fn place_room_in_leaf(
    map: &mut Map,
    nodes: &mut [BspNode],
    leaf_index: usize,
    config: &BspConfig,
    rng: &mut Rng,
) -> Result<(), GenError> {
    let bounds = nodes[leaf_index].bounds;
    let max_room_width = config.room_max_size.min(bounds.width - 2);
    let max_room_height = config.room_max_size.min(bounds.height - 2);
    if max_room_width < config.room_min_size || max_room_height < config.room_min_size {
        return Err(GenError::GenerationFailed("leaf too small for a room"));
    }

    let room_width = rng.range(config.room_min_size, max_room_width);
    let room_height = rng.range(config.room_min_size, max_room_height);

    let min_x = bounds.x + 1;
    let max_x = bounds.x + bounds.width - room_width - 1;
    let min_y = bounds.y + 1;
    let max_y = bounds.y + bounds.height - room_height - 1;
    if max_x < min_x || max_y < min_y {
        return Err(GenError::GenerationFailed("leaf interior too small for a room"));
    }

    let room = Rect::new(rng.range(min_x, max_x), rng.range(min_y, max_y), room_width, room_height);
    carve_rect(map, &room);
    let id = map.add_room(room, ROOM_FLAG_NONE)?;
    nodes[leaf_index].room_id = id;
    Ok(())
}

fn connect_rooms(map: &mut Map, rng: &mut Rng, room_a: i32, room_b: i32) -> Result<(), GenError> {
    let a = map.metadata.rooms[room_a as usize].bounds.center();
    let b = map.metadata.rooms[room_b as usize].bounds.center();
    carve_l_path(map, a, b, 1, rng.coin_flip());
    map.add_corridor(room_a, room_b, 1, l_path_length(a.x, a.y, b.x, b.y))
}

/// Connects the subtree and returns the representative room carried up one
/// level; the representative is chosen by coin flip.
fn connect_tree(
    map: &mut Map,
    rng: &mut Rng,
    nodes: &[BspNode],
    node_index: usize,
) -> Result<i32, GenError> {
    let node = &nodes[node_index];
    if node.is_leaf {
        if node.room_id < 0 {
            return Err(GenError::GenerationFailed("leaf without a room"));
        }
        return Ok(node.room_id);
    }

    let left_room = connect_tree(map, rng, nodes, node.left as usize)?;
    let right_room = connect_tree(map, rng, nodes, node.right as usize)?;
    connect_rooms(map, rng, left_room, right_room)?;

    Ok(if rng.coin_flip() { left_room } else { right_room })
}

pub fn generate(request: &GenerateRequest, map: &mut Map, rng: &mut Rng) -> Result<(), GenError> {
    let AlgorithmParams::BspTree(config) = &request.params else {
        return Err(GenError::InvalidArgument("bsp generator needs its own params"));
    };

    map.fill(Tile::Wall);
    map.clear_metadata();

    let target_rooms = rng.range(config.min_rooms, config.max_rooms);
    let min_leaf = config.room_min_size + 2;

    if map.width() - 2 < min_leaf || map.height() - 2 < min_leaf {
        return Err(GenError::GenerationFailed("map too small for bsp leaves"));
    }

    let mut nodes = vec![BspNode::leaf(Rect::new(1, 1, map.width() - 2, map.height() - 2))];

    loop {
        let mut leaf_count = 0;
        let mut split_candidates: Vec<usize> = Vec::new();
        for (i, node) in nodes.iter().enumerate() {
            if !node.is_leaf {
                continue;
            }
            leaf_count += 1;
            if node.can_split(min_leaf) {
                split_candidates.push(i);
            }
        }

        if leaf_count >= target_rooms || split_candidates.is_empty() {
            break;
        }

        let chosen = split_candidates[rng.range(0, split_candidates.len() as i32 - 1) as usize];
        split_leaf(&mut nodes, chosen, min_leaf, rng);
    }

    let leaf_indices: Vec<usize> = (0..nodes.len()).filter(|&i| nodes[i].is_leaf).collect();
    if (leaf_indices.len() as i32) < config.min_rooms {
        return Err(GenError::GenerationFailed("could not split down to the room minimum"));
    }

    for &leaf_index in &leaf_indices {
        place_room_in_leaf(map, &mut nodes, leaf_index, config, rng)?;
    }

    connect_tree(map, rng, &nodes, 0)?;
    Ok(())
}
