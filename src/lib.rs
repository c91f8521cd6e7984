//! Dungeon Procedural Core
//!
//! Deterministic tile-map generation:
//! - Eight-plus base algorithms (BSP, mazes, caves, noise fields, room graphs)
//! - Post-process pipeline (scaling, room shaping, path smoothing, roughening)
//! - Constraint-driven room-type assignment and recursive room templates
//! - Connectivity analysis (top-down and side-view grounded)
//! - Versioned binary persistence plus PNG/JSON export

pub mod connectivity;
pub mod error;
pub mod export;
pub mod generate;
pub mod generators;
pub mod geometry;
pub mod io;
pub mod logging;
pub mod map;
pub mod metadata;
pub mod process;
pub mod request;
pub mod rng;
pub mod room_types;
pub mod templates;

pub use error::GenError;
pub use generate::generate;
pub use map::{Map, Tile};
pub use request::GenerateRequest;
