//! Chunk binary format and disk I/O
//!
//! File layout, all integers little-endian:
//!
//! ```text
//! [0..4)   magic "CHNK"
//! [4]      format version
//! [5..21)  u16 non-air cell count per section
//! [21..23) u16 max render-bound section
//! [23..25) u16 min render-bound section
//! [25..]   runs: 4 value bytes + u16 count, repeated
//! ```
//!
//! The header carries the occupancy metadata so a loaded chunk does
//! not rescan its cells; the run payload is everything after it.

use std::io;
use std::path::{Path, PathBuf};

use crate::core::error::{DecodeError, EncodeError, Error};
use crate::voxel::block::Block;
use crate::voxel::chunk::{Chunk, ChunkCoord, CHUNK_VOLUME, SECTION_COUNT, SECTION_VOLUME};
use crate::voxel::rle::{self, Run};

const MAGIC: &[u8; 4] = b"CHNK";
const FORMAT_VERSION: u8 = 1;

/// Serialized size of one run
pub const RUN_BYTES: usize = 6;

/// Fixed header size: magic + version + section counts + two bounds
pub const HEADER_LEN: usize = 4 + 1 + SECTION_COUNT * 2 + 2 + 2;

/// File extension for chunk files
pub const CHUNK_FILE_EXTENSION: &str = "chn";

/// Payload parsed from a chunk file
#[derive(Debug, Clone)]
pub struct DecodedChunk {
    pub section_counts: [u16; SECTION_COUNT],
    pub max_render_section: u16,
    pub min_render_section: u16,
    pub cells: Vec<Block>,
}

/// Serialize a chunk to its file bytes.
///
/// Needs `&mut` because the run mirror resyncs lazily. The run total
/// is validated against the chunk volume before any bytes are built.
pub fn encode_chunk(chunk: &mut Chunk) -> Result<Vec<u8>, EncodeError> {
    let section_counts = *chunk.section_counts();
    let max_render_section = chunk.max_render_section();
    let min_render_section = chunk.min_render_section();
    let runs = chunk.runs();

    let covered = rle::total_cells(runs);
    if covered != CHUNK_VOLUME {
        return Err(EncodeError::RunVolumeMismatch {
            expected: CHUNK_VOLUME,
            actual: covered,
        });
    }

    let mut bytes = Vec::with_capacity(HEADER_LEN + runs.len() * RUN_BYTES);
    bytes.extend_from_slice(MAGIC);
    bytes.push(FORMAT_VERSION);
    for count in section_counts {
        bytes.extend_from_slice(&count.to_le_bytes());
    }
    bytes.extend_from_slice(&max_render_section.to_le_bytes());
    bytes.extend_from_slice(&min_render_section.to_le_bytes());
    for run in runs {
        bytes.extend_from_slice(&run.value.to_bytes());
        bytes.extend_from_slice(&run.count.to_le_bytes());
    }

    Ok(bytes)
}

/// Parse chunk file bytes, validating the header and expanding the runs.
pub fn decode_chunk(bytes: &[u8]) -> Result<DecodedChunk, DecodeError> {
    if bytes.len() < HEADER_LEN {
        return Err(DecodeError::TruncatedHeader {
            expected: HEADER_LEN,
            got: bytes.len(),
        });
    }

    let mut magic = [0u8; 4];
    magic.copy_from_slice(&bytes[0..4]);
    if &magic != MAGIC {
        return Err(DecodeError::BadMagic(magic));
    }

    let version = bytes[4];
    if version != FORMAT_VERSION {
        return Err(DecodeError::UnsupportedVersion(version));
    }

    let mut offset = 5;
    let mut section_counts = [0u16; SECTION_COUNT];
    for count in section_counts.iter_mut() {
        *count = u16::from_le_bytes([bytes[offset], bytes[offset + 1]]);
        if *count as usize > SECTION_VOLUME {
            return Err(DecodeError::SectionCountOutOfRange {
                count: *count,
                max: SECTION_VOLUME as u16,
            });
        }
        offset += 2;
    }

    let max_render_section = u16::from_le_bytes([bytes[offset], bytes[offset + 1]]);
    offset += 2;
    let min_render_section = u16::from_le_bytes([bytes[offset], bytes[offset + 1]]);
    offset += 2;
    if max_render_section as usize >= SECTION_COUNT {
        return Err(DecodeError::RenderBoundOutOfRange(max_render_section));
    }
    if min_render_section as usize >= SECTION_COUNT {
        return Err(DecodeError::RenderBoundOutOfRange(min_render_section));
    }

    let payload = &bytes[offset..];
    if payload.len() % RUN_BYTES != 0 {
        return Err(DecodeError::TrailingBytes(payload.len()));
    }

    let mut runs = Vec::with_capacity(payload.len() / RUN_BYTES);
    for raw in payload.chunks_exact(RUN_BYTES) {
        runs.push(Run {
            value: Block::from_bytes([raw[0], raw[1], raw[2], raw[3]]),
            count: u16::from_le_bytes([raw[4], raw[5]]),
        });
    }

    let cells = rle::decompress(&runs, CHUNK_VOLUME)?;

    Ok(DecodedChunk {
        section_counts,
        max_render_section,
        min_render_section,
        cells,
    })
}

/// Get the file path for a chunk.
///
/// Coordinates are formatted as fixed-width hex of their two's
/// complement bits, so negative axes stay distinct and the mapping
/// from coordinate to path is injective.
pub fn chunk_file_path(data_dir: &Path, coord: ChunkCoord) -> PathBuf {
    data_dir.join(format!(
        "{:08x}_{:08x}.{}",
        coord.x as u32, coord.z as u32, CHUNK_FILE_EXTENSION
    ))
}

/// Write a chunk to disk, overwriting any previous file.
///
/// Synchronous: the release path must report the write result to its
/// caller, so this does not go through the async worker pool.
pub fn save_chunk(data_dir: &Path, chunk: &mut Chunk) -> Result<(), Error> {
    let path = chunk_file_path(data_dir, chunk.coord);
    let bytes = encode_chunk(chunk)?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, bytes)?;

    Ok(())
}

/// Load and decode a chunk from disk (if its file exists)
pub async fn load_chunk(data_dir: &Path, coord: ChunkCoord) -> Result<Option<DecodedChunk>, Error> {
    let path = chunk_file_path(data_dir, coord);

    if !path.exists() {
        return Ok(None);
    }

    let bytes = tokio::fs::read(&path).await?;
    let decoded = decode_chunk(&bytes)?;

    Ok(Some(decoded))
}

/// Delete a chunk file from disk. A missing file is not an error.
///
/// Synchronous like [`save_chunk`]: callers sit on the coordinating
/// thread and need the result immediately.
pub fn delete_chunk(data_dir: &Path, coord: ChunkCoord) -> Result<(), io::Error> {
    let path = chunk_file_path(data_dir, coord);

    if path.exists() {
        std::fs::remove_file(&path)?;
    }

    Ok(())
}

/// Check if a chunk file exists on disk
pub fn chunk_exists(data_dir: &Path, coord: ChunkCoord) -> bool {
    chunk_file_path(data_dir, coord).exists()
}
