//! Chunkstore - chunk persistence, streaming and recycling for voxel worlds

pub mod core;
pub mod voxel;
pub mod streaming;
pub mod terrain;
