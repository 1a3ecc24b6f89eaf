//! Error types for the chunk store

use thiserror::Error;

/// Failure modes when decoding a chunk file.
///
/// All of these mean the file is unusable; the provider responds by
/// deleting it and regenerating the chunk from the terrain seed.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("file truncated: {got} bytes, header needs {expected}")]
    TruncatedHeader { expected: usize, got: usize },

    #[error("bad magic bytes {0:02x?}")]
    BadMagic([u8; 4]),

    #[error("unsupported format version {0}")]
    UnsupportedVersion(u8),

    #[error("section cell count {count} exceeds section volume {max}")]
    SectionCountOutOfRange { count: u16, max: u16 },

    #[error("render bound section {0} out of range")]
    RenderBoundOutOfRange(u16),

    #[error("run payload is {0} bytes, not a whole number of runs")]
    TrailingBytes(usize),

    #[error("zero-count run at index {0}")]
    ZeroRunCount(usize),

    #[error("runs expand to {actual} cells, expected {expected}")]
    CellCountMismatch { expected: usize, actual: usize },
}

/// Failure modes when encoding a chunk for disk.
///
/// Raised before any bytes are written, so a failed encode never
/// leaves a partial file behind.
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("run mirror covers {actual} cells, expected {expected}")]
    RunVolumeMismatch { expected: usize, actual: usize },
}

/// Main error type for the chunk store
#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("encode error: {0}")]
    Encode(#[from] EncodeError),

    #[error("config error: {0}")]
    Config(String),

    #[error("provider is shut down")]
    Shutdown,
}
