//! Chunk provider - request/release orchestration over disk and generation.
//!
//! Disk loads run on a bounded worker pool owned by the provider; a
//! finished task sends its complete payload over a channel and
//! [`ChunkProvider::update`] applies it on the coordinating thread, so
//! background tasks never touch chunk state directly. Chunks with no
//! file on disk (or with persistence off) are generated synchronously
//! inside the request call.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::runtime::Runtime;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::core::config::WorldConfig;
use crate::core::error::Error;
use crate::streaming::disk_io::{self, DecodedChunk};
use crate::terrain::generator::ChunkGenerator;
use crate::voxel::block::Block;
use crate::voxel::chunk::{CHUNK_VOLUME, ChunkCoord, Direction};
use crate::voxel::chunk_handle::ChunkHandle;
use crate::voxel::chunk_pool::ChunkPool;

/// Request for the worker loop to load one chunk from disk
struct LoadRequest {
    coord: ChunkCoord,
    ticket: u64,
}

/// Cell data produced by a load task
enum LoadData {
    /// Decoded from the chunk file, metadata included
    Disk(DecodedChunk),
    /// Generated after a missing or unreadable file
    Generated(Vec<Block>),
}

/// Completed load, sent back to the coordinating thread
struct LoadOutcome {
    coord: ChunkCoord,
    ticket: u64,
    data: LoadData,
    /// The file was unreadable. Removal is left to the receiver, which
    /// knows whether this load is still current.
    corrupt_file_detected: bool,
}

/// Book-keeping for one in-flight load
struct PendingLoad {
    handle: Arc<ChunkHandle>,
    ticket: u64,
}

/// Counters for provider activity
#[derive(Debug, Default, Clone)]
pub struct ProviderStats {
    pub loaded_from_disk: u64,
    pub generated: u64,
    pub corrupt_files_removed: u64,
    pub chunks_saved: u64,
    pub save_failures: u64,
    pub cancelled_loads: u64,
}

/// Supplies chunks on demand and recycles them on release.
///
/// Owned by the world's coordinating thread; not `Sync`. The only
/// state touched from worker tasks is the file system and the outcome
/// channel.
pub struct ChunkProvider {
    persist_chunks: bool,
    data_dir: PathBuf,
    pool: Arc<ChunkPool>,
    generator: Arc<dyn ChunkGenerator>,
    /// Chunks currently handed out, by coordinate
    chunks: HashMap<ChunkCoord, Arc<ChunkHandle>>,
    /// In-flight disk loads; the ticket invalidates stale outcomes
    pending: HashMap<ChunkCoord, PendingLoad>,
    /// Closed on shutdown so the worker loop drains and exits
    request_tx: Option<mpsc::UnboundedSender<LoadRequest>>,
    outcome_rx: mpsc::UnboundedReceiver<LoadOutcome>,
    /// Runtime driving the worker loop (kept alive for its tasks)
    #[allow(dead_code)]
    runtime: Runtime,
    next_ticket: u64,
    accepting: bool,
    stats: ProviderStats,
}

impl ChunkProvider {
    /// Create a provider from config with the given generator.
    pub fn new(config: &WorldConfig, generator: Arc<dyn ChunkGenerator>) -> Result<Self, Error> {
        config.validate()?;

        let (request_tx, request_rx) = mpsc::unbounded_channel();
        let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();

        let runtime = Runtime::new()?;

        let data_dir = config.data_dir.clone();
        let worker_dir = data_dir.clone();
        let worker_generator = generator.clone();
        let max_concurrent = config.max_concurrent_loads;
        runtime.spawn(async move {
            worker_loop(worker_dir, worker_generator, max_concurrent, request_rx, outcome_tx).await;
        });

        log::info!(
            "chunk provider ready (persistence {}, data dir {:?}, {} load workers)",
            if config.persist_chunks { "on" } else { "off" },
            data_dir,
            max_concurrent
        );

        Ok(Self {
            persist_chunks: config.persist_chunks,
            data_dir,
            pool: Arc::new(ChunkPool::new()),
            generator,
            chunks: HashMap::new(),
            pending: HashMap::new(),
            request_tx: Some(request_tx),
            outcome_rx,
            runtime,
            next_ticket: 0,
            accepting: true,
            stats: ProviderStats::default(),
        })
    }

    /// Get the chunk at `coord`, reusing the resident handle if there
    /// is one.
    ///
    /// When a chunk file exists the returned handle starts unloaded
    /// and fills in via a background load; poll
    /// [`ChunkHandle::is_loaded`] or watch [`ChunkProvider::update`].
    /// Without a file the chunk is generated before this returns.
    pub fn request_chunk(&mut self, coord: ChunkCoord) -> Result<Arc<ChunkHandle>, Error> {
        if !self.accepting {
            return Err(Error::Shutdown);
        }

        if let Some(handle) = self.chunks.get(&coord) {
            return Ok(handle.clone());
        }

        let handle = self.pool.acquire();
        handle.write().coord = coord;

        if self.persist_chunks && disk_io::chunk_exists(&self.data_dir, coord) {
            let ticket = self.next_ticket;
            self.next_ticket += 1;

            let sent = self
                .request_tx
                .as_ref()
                .map(|tx| tx.send(LoadRequest { coord, ticket }).is_ok())
                .unwrap_or(false);

            if sent {
                log::trace!("chunk {:?} scheduled for disk load (ticket {})", coord, ticket);
                self.pending.insert(coord, PendingLoad { handle: handle.clone(), ticket });
                self.chunks.insert(coord, handle.clone());
                return Ok(handle);
            }

            log::warn!("load worker unavailable, generating chunk {:?} inline", coord);
        }

        self.generate_into(&handle, coord);
        self.chunks.insert(coord, handle.clone());
        self.link_neighbors(coord, &handle);
        Ok(handle)
    }

    /// Apply completed loads. Call regularly from the owning thread.
    ///
    /// Returns the coordinates that became loaded this call.
    pub fn update(&mut self) -> Vec<ChunkCoord> {
        let mut ready = Vec::new();
        while let Ok(outcome) = self.outcome_rx.try_recv() {
            if let Some(coord) = self.apply_outcome(outcome) {
                ready.push(coord);
            }
        }
        ready
    }

    /// Release the chunk at `coord`: persist it (when enabled), reset
    /// it and return it to the pool.
    ///
    /// The chunk is pooled even when persistence fails; the write
    /// error is returned so the caller can escalate. Releasing a chunk
    /// that is still loading cancels the load and skips the persist,
    /// leaving any on-disk file as written.
    pub fn release_chunk(&mut self, coord: ChunkCoord) -> Result<(), Error> {
        let Some(handle) = self.chunks.remove(&coord) else {
            return Ok(());
        };

        let mut persist_result = Ok(());

        if self.pending.remove(&coord).is_some() {
            // Still loading: the dropped pending entry invalidates the
            // ticket, so the payload is discarded on arrival
            self.stats.cancelled_loads += 1;
            log::debug!("cancelled in-flight load for chunk {:?}", coord);
        } else if self.persist_chunks && handle.is_loaded() {
            persist_result = self.persist_chunk(&handle);
        }

        self.unlink_neighbors(coord, &handle);
        self.pool.release(handle);

        persist_result
    }

    /// Stop accepting requests and drain in-flight loads.
    ///
    /// Outcomes already in flight are still applied so their chunks
    /// finish loading; afterwards every request returns
    /// [`Error::Shutdown`]. Resident chunks stay resident and can
    /// still be released.
    pub fn shutdown(&mut self) {
        if !self.accepting {
            return;
        }
        self.accepting = false;

        // Closing the request channel lets the worker loop finish its
        // in-flight tasks and exit, dropping the outcome sender
        self.request_tx = None;
        let mut drained = 0usize;
        while let Some(outcome) = self.outcome_rx.blocking_recv() {
            if self.apply_outcome(outcome).is_some() {
                drained += 1;
            }
        }

        log::info!("chunk provider shut down ({} in-flight loads drained)", drained);
    }

    /// Counters for loads, saves and recoveries
    pub fn stats(&self) -> &ProviderStats {
        &self.stats
    }

    /// The pool backing this provider
    pub fn pool(&self) -> &Arc<ChunkPool> {
        &self.pool
    }

    /// Number of chunks currently handed out
    pub fn resident_count(&self) -> usize {
        self.chunks.len()
    }

    /// Number of disk loads still in flight
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Whether the chunk at `coord` is still waiting on its load
    pub fn is_pending(&self, coord: ChunkCoord) -> bool {
        self.pending.contains_key(&coord)
    }

    /// Look up a resident chunk without requesting it
    pub fn get(&self, coord: ChunkCoord) -> Option<Arc<ChunkHandle>> {
        self.chunks.get(&coord).cloned()
    }

    /// Directory chunk files live in
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Apply one load outcome; returns the coord if it became loaded.
    fn apply_outcome(&mut self, outcome: LoadOutcome) -> Option<ChunkCoord> {
        let coord = outcome.coord;
        match self.pending.get(&coord) {
            Some(pending) if pending.ticket == outcome.ticket => {}
            _ => {
                log::trace!("dropping stale load for chunk {:?} (ticket {})", coord, outcome.ticket);
                return None;
            }
        }
        let pending = self.pending.remove(&coord)?;

        if outcome.corrupt_file_detected {
            // Removal waits for the ticket check above: a cancelled
            // load must not delete a file a newer request may have
            // rewritten in the meantime
            match disk_io::delete_chunk(&self.data_dir, coord) {
                Ok(()) => self.stats.corrupt_files_removed += 1,
                Err(e) => {
                    log::warn!("could not remove corrupt chunk file for {:?}: {}", coord, e);
                }
            }
        }

        match outcome.data {
            LoadData::Disk(decoded) => {
                pending.handle.write().restore(
                    decoded.cells,
                    decoded.section_counts,
                    decoded.min_render_section,
                    decoded.max_render_section,
                );
                self.stats.loaded_from_disk += 1;
                log::trace!("chunk {:?} loaded from disk", coord);
            }
            LoadData::Generated(cells) => {
                pending.handle.write().replace_cells(cells);
                self.stats.generated += 1;
            }
        }

        // Publish only after the write lock is released, then register
        // with neighbors; readers that see the flag see finished cells
        pending.handle.set_loaded(true);
        self.link_neighbors(coord, &pending.handle);
        Some(coord)
    }

    /// Generate terrain into `handle` and publish it.
    fn generate_into(&mut self, handle: &Arc<ChunkHandle>, coord: ChunkCoord) {
        let mut cells = vec![Block::AIR; CHUNK_VOLUME];
        self.generator.generate(coord, &mut cells);
        handle.write().replace_cells(cells);
        handle.set_loaded(true);
        self.stats.generated += 1;
        log::trace!("generated chunk {:?}", coord);
    }

    /// Encode and write one loaded chunk.
    fn persist_chunk(&mut self, handle: &Arc<ChunkHandle>) -> Result<(), Error> {
        let mut chunk = handle.write();
        let coord = chunk.coord;
        match disk_io::save_chunk(&self.data_dir, &mut chunk) {
            Ok(()) => {
                self.stats.chunks_saved += 1;
                log::trace!("saved chunk {:?}", coord);
                Ok(())
            }
            Err(e) => {
                self.stats.save_failures += 1;
                log::warn!("failed to save chunk {:?}: {}", coord, e);
                Err(e)
            }
        }
    }

    /// Register `handle` with its loaded neighbors, both directions.
    /// Called only after the handle's loaded flag is set.
    fn link_neighbors(&self, coord: ChunkCoord, handle: &Arc<ChunkHandle>) {
        for dir in Direction::ALL {
            let Some(other) = self.chunks.get(&coord.neighbor(dir)) else {
                continue;
            };
            if !other.is_loaded() {
                continue;
            }
            handle.write().set_neighbor(dir, Arc::downgrade(other));
            other.write().set_neighbor(dir.opposite(), Arc::downgrade(handle));
        }
    }

    /// Drop neighbor references in both directions before pooling.
    ///
    /// The handle's allocation lives on in the pool, so neighbors must
    /// not keep back-references that would resolve to a recycled chunk.
    fn unlink_neighbors(&self, coord: ChunkCoord, handle: &Arc<ChunkHandle>) {
        for dir in Direction::ALL {
            if let Some(other) = self.chunks.get(&coord.neighbor(dir)) {
                other.write().clear_neighbor(dir.opposite());
            }
        }
        handle.write().clear_neighbors();
    }
}

impl Drop for ChunkProvider {
    fn drop(&mut self) {
        // Closing the request channel signals the worker to exit after
        // finishing in-flight tasks; the runtime shuts down with us
        self.request_tx = None;
    }
}

/// Worker loop: runs load tasks with bounded concurrency.
///
/// Requests queue in arrival order; at most `max_concurrent` tasks are
/// in flight. Exits when the request channel closes and all work is
/// done.
async fn worker_loop(
    data_dir: PathBuf,
    generator: Arc<dyn ChunkGenerator>,
    max_concurrent: usize,
    mut request_rx: mpsc::UnboundedReceiver<LoadRequest>,
    outcome_tx: mpsc::UnboundedSender<LoadOutcome>,
) {
    let mut active_tasks = JoinSet::new();
    let mut queued: VecDeque<LoadRequest> = VecDeque::new();
    let mut channel_open = true;

    loop {
        tokio::select! {
            request = request_rx.recv(), if channel_open => {
                match request {
                    Some(request) => queued.push_back(request),
                    None => channel_open = false,
                }
            }

            Some(result) = active_tasks.join_next(), if !active_tasks.is_empty() => {
                match result {
                    Ok(outcome) => {
                        let _ = outcome_tx.send(outcome);
                    }
                    Err(e) => {
                        log::error!("chunk load task panicked: {}", e);
                    }
                }
            }

            else => {
                if !channel_open && queued.is_empty() && active_tasks.is_empty() {
                    break;
                }
            }
        }

        while active_tasks.len() < max_concurrent {
            let Some(request) = queued.pop_front() else {
                break;
            };
            let dir = data_dir.clone();
            let generator = generator.clone();
            active_tasks.spawn(async move {
                load_chunk_task(dir, generator, request).await
            });
        }
    }
}

/// Load one chunk from disk, falling back to generation on failure.
///
/// The fallback runs here on the same task, so the coordinating
/// thread only ever sees finished payloads. A corrupt file is
/// reported, never deleted, from this task; by the time the outcome
/// lands the load may have been cancelled and the path rewritten.
async fn load_chunk_task(
    data_dir: PathBuf,
    generator: Arc<dyn ChunkGenerator>,
    request: LoadRequest,
) -> LoadOutcome {
    let coord = request.coord;

    let failure = match disk_io::load_chunk(&data_dir, coord).await {
        Ok(Some(decoded)) => {
            return LoadOutcome {
                coord,
                ticket: request.ticket,
                data: LoadData::Disk(decoded),
                corrupt_file_detected: false,
            };
        }
        // File vanished between the existence check and the read;
        // treat it like a never-persisted chunk
        Ok(None) => None,
        Err(e) => Some(e),
    };

    let corrupt_file_detected = failure.is_some();
    if let Some(e) = failure {
        log::warn!("chunk {:?} failed to load, regenerating: {}", coord, e);
    }

    let mut cells = vec![Block::AIR; CHUNK_VOLUME];
    generator.generate(coord, &mut cells);

    LoadOutcome {
        coord,
        ticket: request.ticket,
        data: LoadData::Generated(cells),
        corrupt_file_detected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terrain::generator::TerrainGenerator;
    use crate::voxel::block::ids;
    use std::time::Duration;

    fn test_config(dir: &Path, persist: bool) -> WorldConfig {
        WorldConfig {
            persist_chunks: persist,
            data_dir: dir.to_path_buf(),
            max_concurrent_loads: 2,
            ..Default::default()
        }
    }

    fn test_provider(config: &WorldConfig) -> ChunkProvider {
        let generator = Arc::new(TerrainGenerator::new(config.terrain_params.clone()));
        ChunkProvider::new(config, generator).expect("provider creation failed")
    }

    fn wait_loaded(provider: &mut ChunkProvider, handle: &Arc<ChunkHandle>) {
        for _ in 0..500 {
            provider.update();
            if handle.is_loaded() {
                return;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        panic!("chunk never finished loading");
    }

    #[test]
    fn test_generates_when_no_file_exists() {
        let dir = tempfile::tempdir().unwrap();
        let mut provider = test_provider(&test_config(dir.path(), true));

        let handle = provider.request_chunk(ChunkCoord::new(0, 0)).unwrap();
        assert!(handle.is_loaded());
        assert!(!handle.read().is_empty());
        assert_eq!(provider.stats().generated, 1);
        assert_eq!(provider.pending_count(), 0);
    }

    #[test]
    fn test_request_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let mut provider = test_provider(&test_config(dir.path(), true));
        let coord = ChunkCoord::new(2, -5);

        let first = provider.request_chunk(coord).unwrap();
        let second = provider.request_chunk(coord).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(provider.resident_count(), 1);
        assert_eq!(provider.stats().generated, 1);
    }

    #[test]
    fn test_release_persists_and_reload_matches() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path(), true);
        let mut provider = test_provider(&config);
        let coord = ChunkCoord::new(1, 2);

        // Markers in two different sections, so the restored render
        // bounds cannot collapse into one value
        let handle = provider.request_chunk(coord).unwrap();
        handle.write().set_block(3, 20, 3, Block::with_state(ids::STONE, 7));
        handle.write().set_block(3, 99, 3, Block::with_state(ids::STONE, 9));
        let saved_counts = *handle.read().section_counts();
        provider.release_chunk(coord).expect("release failed");

        assert!(disk_io::chunk_exists(dir.path(), coord));
        assert_eq!(provider.stats().chunks_saved, 1);
        assert_eq!(provider.resident_count(), 0);

        // Request again: comes back from disk with the edits and the
        // occupancy metadata intact
        let handle = provider.request_chunk(coord).unwrap();
        assert!(!handle.is_loaded());
        assert!(provider.is_pending(coord));
        wait_loaded(&mut provider, &handle);

        {
            let chunk = handle.read();
            assert_eq!(chunk.get_block(3, 20, 3), Block::with_state(ids::STONE, 7));
            assert_eq!(chunk.get_block(3, 99, 3), Block::with_state(ids::STONE, 9));
            assert_eq!(chunk.section_counts(), &saved_counts);
            // Terrain keeps section 0 occupied; the y=99 marker owns
            // the top bound
            assert_eq!(chunk.min_render_section(), 0);
            assert_eq!(chunk.max_render_section(), 6);
        }
        assert_eq!(provider.stats().loaded_from_disk, 1);
    }

    #[test]
    fn test_corrupt_file_regenerates_and_deletes() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path(), true);
        let mut provider = test_provider(&config);
        let coord = ChunkCoord::new(4, 4);

        // A truncated file: too short for even the header
        std::fs::write(disk_io::chunk_file_path(dir.path(), coord), b"CHNK\x01").unwrap();

        let handle = provider.request_chunk(coord).unwrap();
        assert!(!handle.is_loaded());
        wait_loaded(&mut provider, &handle);

        // Regenerated content matches the generator, corrupt file gone
        let generator = TerrainGenerator::new(config.terrain_params.clone());
        let mut expected = vec![Block::AIR; CHUNK_VOLUME];
        generator.generate(coord, &mut expected);
        assert_eq!(handle.read().cells(), &expected[..]);

        assert!(!disk_io::chunk_exists(dir.path(), coord));
        assert_eq!(provider.stats().corrupt_files_removed, 1);
        assert_eq!(provider.stats().generated, 1);
        assert_eq!(provider.stats().loaded_from_disk, 0);
    }

    #[test]
    fn test_cancelled_load_does_not_delete_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path(), true);
        let mut provider = test_provider(&config);
        let coord = ChunkCoord::new(8, -8);

        let path = disk_io::chunk_file_path(dir.path(), coord);
        std::fs::write(&path, b"CHNK\x01").unwrap();

        // Cancel while the unreadable file is still being loaded
        let _handle = provider.request_chunk(coord).unwrap();
        assert!(provider.is_pending(coord));
        provider.release_chunk(coord).expect("release failed");
        assert_eq!(provider.stats().cancelled_loads, 1);

        // The stale outcome reports the corruption but must not touch
        // the file; a later request may own the path by now
        for _ in 0..20 {
            provider.update();
            std::thread::sleep(Duration::from_millis(10));
        }
        assert!(path.exists());
        assert_eq!(provider.stats().corrupt_files_removed, 0);

        // A fresh request hits the same bytes and cleans up for real
        let handle = provider.request_chunk(coord).unwrap();
        wait_loaded(&mut provider, &handle);
        assert!(!path.exists());
        assert_eq!(provider.stats().corrupt_files_removed, 1);
        assert_eq!(provider.stats().generated, 1);
    }

    #[test]
    fn test_release_recycles_instance() {
        let dir = tempfile::tempdir().unwrap();
        let mut provider = test_provider(&test_config(dir.path(), false));

        let first = provider.request_chunk(ChunkCoord::new(0, 0)).unwrap();
        provider.release_chunk(ChunkCoord::new(0, 0)).unwrap();
        assert_eq!(provider.pool().free_count(), 1);

        let second = provider.request_chunk(ChunkCoord::new(10, 10)).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.coord(), ChunkCoord::new(10, 10));
        assert!(second.is_loaded());
        assert_eq!(provider.pool().created(), 1);
    }

    #[test]
    fn test_concurrent_loads_stay_distinct() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path(), true);
        let mut provider = test_provider(&config);
        let coord_a = ChunkCoord::new(0, 0);
        let coord_b = ChunkCoord::new(7, -7);

        // Persist two chunks with distinct markers
        let handle = provider.request_chunk(coord_a).unwrap();
        handle.write().set_block(0, 50, 0, Block::with_state(ids::SAND, 1));
        provider.release_chunk(coord_a).unwrap();

        let handle = provider.request_chunk(coord_b).unwrap();
        handle.write().set_block(0, 50, 0, Block::with_state(ids::SAND, 2));
        provider.release_chunk(coord_b).unwrap();

        // Load both concurrently
        let handle_a = provider.request_chunk(coord_a).unwrap();
        let handle_b = provider.request_chunk(coord_b).unwrap();
        assert_eq!(provider.pending_count(), 2);
        wait_loaded(&mut provider, &handle_a);
        wait_loaded(&mut provider, &handle_b);

        // Each handle got its own file's cells
        assert_eq!(handle_a.read().get_block(0, 50, 0), Block::with_state(ids::SAND, 1));
        assert_eq!(handle_b.read().get_block(0, 50, 0), Block::with_state(ids::SAND, 2));
        assert_eq!(handle_a.coord(), coord_a);
        assert_eq!(handle_b.coord(), coord_b);
    }

    #[test]
    fn test_release_while_loading_cancels() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path(), true);
        let mut provider = test_provider(&config);
        let coord = ChunkCoord::new(3, 3);

        let handle = provider.request_chunk(coord).unwrap();
        handle.write().set_block(1, 1, 1, Block::new(ids::DIRT));
        provider.release_chunk(coord).unwrap();
        let file_bytes = std::fs::read(disk_io::chunk_file_path(dir.path(), coord)).unwrap();

        // Request (goes async) then release before the load lands
        let _handle = provider.request_chunk(coord).unwrap();
        assert!(provider.is_pending(coord));
        provider.release_chunk(coord).expect("release failed");

        assert_eq!(provider.stats().cancelled_loads, 1);
        assert_eq!(provider.pending_count(), 0);
        assert_eq!(provider.resident_count(), 0);
        assert_eq!(provider.pool().free_count(), 1);

        // Drain any stale outcome; nothing becomes loaded from it
        std::thread::sleep(Duration::from_millis(100));
        assert!(provider.update().is_empty());

        // The never-loaded release did not clobber the file
        let current = std::fs::read(disk_io::chunk_file_path(dir.path(), coord)).unwrap();
        assert_eq!(current, file_bytes);
    }

    #[test]
    fn test_persist_failure_still_pools() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path(), true);
        let mut provider = test_provider(&config);
        let coord = ChunkCoord::new(6, 6);

        let _handle = provider.request_chunk(coord).unwrap();

        // A directory squatting on the chunk's path makes the write fail
        std::fs::create_dir_all(disk_io::chunk_file_path(dir.path(), coord)).unwrap();

        let result = provider.release_chunk(coord);
        assert!(matches!(result, Err(Error::Io(_))));
        assert_eq!(provider.stats().save_failures, 1);

        // The chunk still came back to the pool
        assert_eq!(provider.resident_count(), 0);
        assert_eq!(provider.pool().free_count(), 1);
    }

    #[test]
    fn test_persistence_disabled_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut provider = test_provider(&test_config(dir.path(), false));
        let coord = ChunkCoord::new(1, 1);

        let handle = provider.request_chunk(coord).unwrap();
        assert!(handle.is_loaded());
        provider.release_chunk(coord).unwrap();

        assert!(!disk_io::chunk_exists(dir.path(), coord));
        assert_eq!(provider.stats().chunks_saved, 0);
    }

    #[test]
    fn test_shutdown_drains_and_rejects() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path(), true);
        let mut provider = test_provider(&config);
        let coord = ChunkCoord::new(2, 2);

        let handle = provider.request_chunk(coord).unwrap();
        provider.release_chunk(coord).unwrap();

        let handle2 = provider.request_chunk(coord).unwrap();
        assert!(Arc::ptr_eq(&handle, &handle2));
        provider.shutdown();

        // The in-flight load was applied during the drain
        assert!(handle2.is_loaded());
        assert_eq!(provider.pending_count(), 0);

        let err = provider.request_chunk(ChunkCoord::new(9, 9)).unwrap_err();
        assert!(matches!(err, Error::Shutdown));
    }

    #[test]
    fn test_neighbor_linking() {
        let dir = tempfile::tempdir().unwrap();
        let mut provider = test_provider(&test_config(dir.path(), false));

        let a = provider.request_chunk(ChunkCoord::new(0, 0)).unwrap();
        let b = provider.request_chunk(ChunkCoord::new(1, 0)).unwrap();

        let linked = a.read().neighbor_handle(Direction::PosX).expect("missing neighbor");
        assert!(Arc::ptr_eq(&linked, &b));
        let back = b.read().neighbor_handle(Direction::NegX).expect("missing back link");
        assert!(Arc::ptr_eq(&back, &a));

        // Releasing one side drops the other side's reference
        provider.release_chunk(ChunkCoord::new(1, 0)).unwrap();
        assert!(a.read().neighbor_handle(Direction::PosX).is_none());
    }
}
