//! Chunk persistence and streaming

pub mod disk_io;
pub mod provider;

pub use disk_io::{
    DecodedChunk,
    encode_chunk, decode_chunk,
    save_chunk, load_chunk, delete_chunk, chunk_exists,
    chunk_file_path,
};
pub use provider::{ChunkProvider, ProviderStats};
