//! ChunkHandle - shared wrapper for chunks crossing thread boundaries.
//!
//! Holds the chunk state behind a lock plus a loaded flag readers can
//! poll without taking the lock.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::voxel::chunk::{Chunk, ChunkCoord};

/// Thread-safe handle to a chunk.
///
/// The loaded flag is stored with release ordering after the cell data
/// is fully written and read with acquire ordering, so any thread that
/// observes `is_loaded() == true` also observes the finished cells.
pub struct ChunkHandle {
    /// Chunk state (cells + derived metadata)
    state: RwLock<Chunk>,
    /// Set once the cell data is fully populated
    loaded: AtomicBool,
}

impl std::fmt::Debug for ChunkHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkHandle")
            .field("state", &"<Chunk>")
            .field("loaded", &self.loaded)
            .finish()
    }
}

impl ChunkHandle {
    /// Create a handle around a cleared, unloaded chunk.
    pub fn new(coord: ChunkCoord) -> Self {
        Self {
            state: RwLock::new(Chunk::new(coord)),
            loaded: AtomicBool::new(false),
        }
    }

    /// Check whether the chunk contents are published.
    pub fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::Acquire)
    }

    /// Publish (or retract) the chunk contents.
    ///
    /// Callers must finish writing cell data before setting this true.
    pub fn set_loaded(&self, loaded: bool) {
        self.loaded.store(loaded, Ordering::Release);
    }

    /// Coordinate of the chunk (takes the read lock briefly).
    pub fn coord(&self) -> ChunkCoord {
        self.read().coord
    }

    /// Get read access to the chunk.
    pub fn read(&self) -> RwLockReadGuard<'_, Chunk> {
        self.state.read().unwrap()
    }

    /// Get write access to the chunk.
    pub fn write(&self) -> RwLockWriteGuard<'_, Chunk> {
        self.state.write().unwrap()
    }
}
