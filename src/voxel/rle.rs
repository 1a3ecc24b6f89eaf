//! Run-length codec for chunk cell data

use crate::core::error::DecodeError;
use crate::voxel::block::Block;
use crate::voxel::chunk::SECTION_VOLUME;

/// Longest run the codec will emit.
///
/// Capped at one section's worth of cells so run counts always fit the
/// 16-bit count field of the disk format.
pub const MAX_RUN_LENGTH: u16 = SECTION_VOLUME as u16;

/// A run of identical cells
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Run {
    pub value: Block,
    pub count: u16,
}

/// Compress a cell array into runs.
///
/// A run ends when the value changes or [`MAX_RUN_LENGTH`] is reached;
/// longer stretches of one value split into consecutive runs. Empty
/// input yields no runs. Deterministic: equal inputs give equal runs.
pub fn compress(cells: &[Block]) -> Vec<Run> {
    let mut runs = Vec::new();
    let mut iter = cells.iter();
    let Some(&first) = iter.next() else {
        return runs;
    };

    let mut current = Run { value: first, count: 1 };
    for &cell in iter {
        if cell == current.value && current.count < MAX_RUN_LENGTH {
            current.count += 1;
        } else {
            runs.push(current);
            current = Run { value: cell, count: 1 };
        }
    }
    runs.push(current);
    runs
}

/// Expand runs into a freshly allocated array of `expected_len` cells.
pub fn decompress(runs: &[Run], expected_len: usize) -> Result<Vec<Block>, DecodeError> {
    let mut cells = vec![Block::AIR; expected_len];
    decompress_into(runs, &mut cells)?;
    Ok(cells)
}

/// Expand runs into a pre-sized cell buffer.
///
/// Rejects zero-count runs and any run total that does not exactly
/// fill the buffer, so a malformed sequence can never produce an
/// under- or over-sized chunk.
pub fn decompress_into(runs: &[Run], out: &mut [Block]) -> Result<(), DecodeError> {
    let mut offset = 0usize;
    for (i, run) in runs.iter().enumerate() {
        if run.count == 0 {
            return Err(DecodeError::ZeroRunCount(i));
        }
        let end = offset + run.count as usize;
        if end > out.len() {
            return Err(DecodeError::CellCountMismatch {
                expected: out.len(),
                actual: total_cells(runs),
            });
        }
        out[offset..end].fill(run.value);
        offset = end;
    }
    if offset != out.len() {
        return Err(DecodeError::CellCountMismatch {
            expected: out.len(),
            actual: offset,
        });
    }
    Ok(())
}

/// Total number of cells a run sequence covers
pub fn total_cells(runs: &[Run]) -> usize {
    runs.iter().map(|r| r.count as usize).sum()
}
