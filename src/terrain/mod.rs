//! Procedural terrain generation

pub mod generator;
pub use generator::{ChunkGenerator, TerrainGenerator, TerrainParams};
