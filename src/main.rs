//! CLI demo: generate a map, persist the binary container, and write the
//! PNG/JSON side-cars.
//!
//! Usage: dungeon-procedural-core <algorithm> <width> <height> <seed> [prefix]

use anyhow::{bail, Context, Result};

use dungeon_core::export::export_png_json;
use dungeon_core::generate::generate;
use dungeon_core::io::save_map;
use dungeon_core::logging::init_tracing_default;
use dungeon_core::request::{Algorithm, GenerateRequest};

fn parse_algorithm(name: &str) -> Option<Algorithm> {
    match name {
        "bsp_tree" => Some(Algorithm::BspTree),
        "rooms_and_mazes" => Some(Algorithm::RoomsAndMazes),
        "drunkards_walk" => Some(Algorithm::DrunkardsWalk),
        "cellular_automata" => Some(Algorithm::CellularAutomata),
        "value_noise" => Some(Algorithm::ValueNoise),
        "room_graph" => Some(Algorithm::RoomGraph),
        "worm_caves" => Some(Algorithm::WormCaves),
        "simplex_noise" => Some(Algorithm::SimplexNoise),
        "rooms_and_corridors" => Some(Algorithm::RoomsAndCorridors),
        "organic_cave" => Some(Algorithm::OrganicCave),
        _ => None,
    }
}

fn main() -> Result<()> {
    init_tracing_default();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.len() < 4 {
        bail!("usage: dungeon-procedural-core <algorithm> <width> <height> <seed> [prefix]");
    }

    let Some(algorithm) = parse_algorithm(&args[0]) else {
        bail!("unknown algorithm '{}'", args[0]);
    };
    let width: i32 = args[1].parse().context("width must be an integer")?;
    let height: i32 = args[2].parse().context("height must be an integer")?;
    let seed: u64 = args[3].parse().context("seed must be an unsigned integer")?;
    let prefix = args.get(4).map(String::as_str).unwrap_or("map");

    let request = GenerateRequest::new(algorithm, width, height, seed);
    let map = generate(&request)?;

    let container_path = format!("{prefix}.dgmap");
    let png_path = format!("{prefix}.png");
    let json_path = format!("{prefix}.json");

    save_map(&map, &container_path)
        .with_context(|| format!("saving container to {container_path}"))?;
    export_png_json(&map, &png_path, &json_path)
        .with_context(|| format!("exporting side-cars to {png_path} / {json_path}"))?;

    println!(
        "{}x{} {} seed={} rooms={} walkable={} -> {container_path}",
        map.width(),
        map.height(),
        algorithm.name(),
        seed,
        map.metadata.rooms.len(),
        map.metadata.walkable_tile_count,
    );
    Ok(())
}
