//! Chunk pool - recycles chunk instances across load/unload cycles.
//!
//! Chunks are large allocations; instead of dropping them when a
//! region unloads, released instances are cleared and parked on a
//! free list for the next acquire.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::voxel::chunk::ChunkCoord;
use crate::voxel::chunk_handle::ChunkHandle;

/// Pool of reusable chunk handles.
///
/// The free list is the only structure shared across threads and is
/// mutex-guarded; handed-out chunks belong to their caller.
pub struct ChunkPool {
    /// Cleared handles ready for reuse
    free: Mutex<Vec<Arc<ChunkHandle>>>,
    /// Total handles ever created
    created: AtomicUsize,
}

impl ChunkPool {
    /// Create an empty pool
    pub fn new() -> Self {
        Self {
            free: Mutex::new(Vec::new()),
            created: AtomicUsize::new(0),
        }
    }

    /// Take a cleared handle from the pool, creating one if none are free.
    ///
    /// The returned chunk is all air with `is_loaded() == false`; the
    /// caller assigns the coordinate.
    pub fn acquire(&self) -> Arc<ChunkHandle> {
        if let Some(handle) = self.free.lock().unwrap().pop() {
            return handle;
        }

        let created = self.created.fetch_add(1, Ordering::Relaxed) + 1;
        log::debug!("chunk pool grew to {} instances", created);
        Arc::new(ChunkHandle::new(ChunkCoord::new(0, 0)))
    }

    /// Clear a handle and park it for reuse.
    ///
    /// Ownership transfers to the pool; the caller must not keep using
    /// the handle afterwards.
    pub fn release(&self, handle: Arc<ChunkHandle>) {
        handle.set_loaded(false);
        handle.write().clear();
        self.free.lock().unwrap().push(handle);
    }

    /// Handles currently parked on the free list
    pub fn free_count(&self) -> usize {
        self.free.lock().unwrap().len()
    }

    /// Total handles ever created
    pub fn created(&self) -> usize {
        self.created.load(Ordering::Relaxed)
    }
}

impl Default for ChunkPool {
    fn default() -> Self {
        Self::new()
    }
}
