//! Voxel chunk data structures

pub mod block;
pub mod chunk;
pub mod chunk_handle;
pub mod chunk_pool;
pub mod rle;

pub use block::Block;
pub use chunk::{Chunk, ChunkCoord, Direction};
pub use chunk_handle::ChunkHandle;
pub use chunk_pool::ChunkPool;
