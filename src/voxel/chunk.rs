//! Chunk system for managing fixed-size columns of block data

use std::sync::{Arc, Weak};

use glam::Vec3;

use crate::voxel::block::Block;
use crate::voxel::chunk_handle::ChunkHandle;
use crate::voxel::rle::{self, Run};

/// Cells per chunk side on the horizontal axes
pub const CHUNK_DIM: usize = 16;

/// Cells per section on the vertical axis
pub const SECTION_HEIGHT: usize = 16;

/// Vertical sections per chunk
pub const SECTION_COUNT: usize = 8;

/// Total cells on the vertical axis
pub const CHUNK_HEIGHT: usize = SECTION_HEIGHT * SECTION_COUNT;

/// Cells in one vertical section
pub const SECTION_VOLUME: usize = CHUNK_DIM * CHUNK_DIM * SECTION_HEIGHT;

/// Cells in one chunk
pub const CHUNK_VOLUME: usize = CHUNK_DIM * CHUNK_DIM * CHUNK_HEIGHT;

/// Flat index of a cell within a chunk's cell array.
///
/// Layout is column-major with y fastest, so the vertical bands
/// terrain produces (stone below, air above) compress into long runs.
#[inline]
pub fn cell_index(x: usize, y: usize, z: usize) -> usize {
    debug_assert!(x < CHUNK_DIM && y < CHUNK_HEIGHT && z < CHUNK_DIM);
    (x * CHUNK_DIM + z) * CHUNK_HEIGHT + y
}

/// Integer coordinate identifying a chunk column in the world grid
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChunkCoord {
    pub x: i32,
    pub z: i32,
}

impl ChunkCoord {
    /// Create a new chunk coordinate
    pub fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Convert world position to the containing chunk coordinate
    pub fn from_world_pos(pos: Vec3) -> Self {
        Self {
            x: (pos.x / CHUNK_DIM as f32).floor() as i32,
            z: (pos.z / CHUNK_DIM as f32).floor() as i32,
        }
    }

    /// Get the world-space origin (minimum corner) of this chunk
    pub fn world_origin(&self) -> Vec3 {
        Vec3::new(
            self.x as f32 * CHUNK_DIM as f32,
            0.0,
            self.z as f32 * CHUNK_DIM as f32,
        )
    }

    /// Coordinate one step in the given direction
    pub fn neighbor(&self, dir: Direction) -> Self {
        let (dx, dz) = dir.offset();
        Self { x: self.x + dx, z: self.z + dz }
    }
}

/// Horizontal neighbor directions
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    NegX = 0,
    PosX = 1,
    NegZ = 2,
    PosZ = 3,
}

impl Direction {
    /// All four directions, in neighbor-array order
    pub const ALL: [Direction; 4] = [
        Direction::NegX,
        Direction::PosX,
        Direction::NegZ,
        Direction::PosZ,
    ];

    /// Grid offset for this direction
    pub fn offset(&self) -> (i32, i32) {
        match self {
            Direction::NegX => (-1, 0),
            Direction::PosX => (1, 0),
            Direction::NegZ => (0, -1),
            Direction::PosZ => (0, 1),
        }
    }

    /// The direction pointing back at this one
    pub fn opposite(&self) -> Direction {
        match self {
            Direction::NegX => Direction::PosX,
            Direction::PosX => Direction::NegX,
            Direction::NegZ => Direction::PosZ,
            Direction::PosZ => Direction::NegZ,
        }
    }

    /// Index into a neighbor array
    pub fn index(&self) -> usize {
        *self as usize
    }
}

/// A chunk column's cell data plus the derived metadata the disk
/// format stores alongside it.
///
/// Section occupancy counts, the vertical render bounds and the
/// run-length mirror are maintained incrementally by [`set_block`]
/// (the mirror lazily, via a dirty bit) so persisting a chunk never
/// has to rescan untouched data.
///
/// [`set_block`]: Chunk::set_block
pub struct Chunk {
    /// Coordinate of this chunk in the world grid
    pub coord: ChunkCoord,
    /// Flat cell array, indexed by [`cell_index`]
    cells: Vec<Block>,
    /// Non-air cell count per vertical section
    section_counts: [u16; SECTION_COUNT],
    /// Lowest section worth rendering
    min_render_section: u16,
    /// Highest section worth rendering
    max_render_section: u16,
    /// Total non-air cells
    non_air: u32,
    /// Run-length mirror of `cells`, rebuilt on demand
    runs: Vec<Run>,
    runs_dirty: bool,
    /// Back-references to horizontal neighbors, indexed by Direction
    neighbors: [Option<Weak<ChunkHandle>>; 4],
}

impl Chunk {
    /// Create a new empty chunk at the given coordinate
    pub fn new(coord: ChunkCoord) -> Self {
        Self {
            coord,
            cells: vec![Block::AIR; CHUNK_VOLUME],
            section_counts: [0; SECTION_COUNT],
            min_render_section: 0,
            max_render_section: 0,
            non_air: 0,
            runs: Vec::new(),
            runs_dirty: true,
            neighbors: [None, None, None, None],
        }
    }

    /// Get the cell at local coordinates
    pub fn get_block(&self, x: usize, y: usize, z: usize) -> Block {
        self.cells[cell_index(x, y, z)]
    }

    /// Set the cell at local coordinates, keeping metadata in sync
    pub fn set_block(&mut self, x: usize, y: usize, z: usize, block: Block) {
        let idx = cell_index(x, y, z);
        let old = self.cells[idx];
        if old == block {
            return;
        }

        let section = y / SECTION_HEIGHT;
        match (old.is_air(), block.is_air()) {
            (true, false) => {
                self.section_counts[section] += 1;
                self.non_air += 1;
                self.recompute_render_bounds();
            }
            (false, true) => {
                self.section_counts[section] -= 1;
                self.non_air -= 1;
                self.recompute_render_bounds();
            }
            _ => {}
        }

        self.cells[idx] = block;
        self.runs_dirty = true;
    }

    /// Replace all cell data at once and recompute metadata
    /// (generation path).
    pub fn replace_cells(&mut self, cells: Vec<Block>) {
        debug_assert_eq!(cells.len(), CHUNK_VOLUME);
        self.cells = cells;
        self.recompute_metadata();
    }

    /// Replace cell data with metadata already known from a decoded
    /// file header (disk load path).
    pub fn restore(
        &mut self,
        cells: Vec<Block>,
        section_counts: [u16; SECTION_COUNT],
        min_render_section: u16,
        max_render_section: u16,
    ) {
        debug_assert_eq!(cells.len(), CHUNK_VOLUME);
        self.cells = cells;
        self.section_counts = section_counts;
        self.min_render_section = min_render_section;
        self.max_render_section = max_render_section;
        self.non_air = section_counts.iter().map(|&c| c as u32).sum();
        self.runs.clear();
        self.runs_dirty = true;
    }

    /// Reset to a cleared state ready for pooling
    pub fn clear(&mut self) {
        self.coord = ChunkCoord::new(0, 0);
        self.cells.fill(Block::AIR);
        self.section_counts = [0; SECTION_COUNT];
        self.min_render_section = 0;
        self.max_render_section = 0;
        self.non_air = 0;
        self.runs.clear();
        self.runs_dirty = true;
        self.neighbors = [None, None, None, None];
    }

    /// The flat cell array
    pub fn cells(&self) -> &[Block] {
        &self.cells
    }

    /// Non-air cell count per vertical section
    pub fn section_counts(&self) -> &[u16; SECTION_COUNT] {
        &self.section_counts
    }

    /// Lowest section worth rendering (0 when the chunk is empty)
    pub fn min_render_section(&self) -> u16 {
        self.min_render_section
    }

    /// Highest section worth rendering (0 when the chunk is empty)
    pub fn max_render_section(&self) -> u16 {
        self.max_render_section
    }

    /// Total non-air cells
    pub fn non_air_count(&self) -> u32 {
        self.non_air
    }

    /// Whether every cell is air
    pub fn is_empty(&self) -> bool {
        self.non_air == 0
    }

    /// Run-length view of the cells, resynced if edits invalidated it
    pub fn runs(&mut self) -> &[Run] {
        if self.runs_dirty {
            self.runs = rle::compress(&self.cells);
            self.runs_dirty = false;
        }
        &self.runs
    }

    /// Store a back-reference to a neighboring chunk
    pub fn set_neighbor(&mut self, dir: Direction, handle: Weak<ChunkHandle>) {
        self.neighbors[dir.index()] = Some(handle);
    }

    /// Drop the back-reference in one direction
    pub fn clear_neighbor(&mut self, dir: Direction) {
        self.neighbors[dir.index()] = None;
    }

    /// Drop all neighbor back-references
    pub fn clear_neighbors(&mut self) {
        self.neighbors = [None, None, None, None];
    }

    /// Get the neighboring chunk in `dir`, if registered and alive
    pub fn neighbor_handle(&self, dir: Direction) -> Option<Arc<ChunkHandle>> {
        self.neighbors[dir.index()].as_ref().and_then(|w| w.upgrade())
    }

    fn recompute_metadata(&mut self) {
        self.section_counts = [0; SECTION_COUNT];
        self.non_air = 0;
        for (idx, cell) in self.cells.iter().enumerate() {
            if !cell.is_air() {
                let y = idx % CHUNK_HEIGHT;
                self.section_counts[y / SECTION_HEIGHT] += 1;
                self.non_air += 1;
            }
        }
        self.recompute_render_bounds();
        self.runs.clear();
        self.runs_dirty = true;
    }

    fn recompute_render_bounds(&mut self) {
        let mut lo = None;
        let mut hi = 0;
        for (i, &count) in self.section_counts.iter().enumerate() {
            if count > 0 {
                if lo.is_none() {
                    lo = Some(i);
                }
                hi = i;
            }
        }
        match lo {
            Some(lo) => {
                self.min_render_section = lo as u16;
                self.max_render_section = hi as u16;
            }
            None => {
                self.min_render_section = 0;
                self.max_render_section = 0;
            }
        }
    }
}
