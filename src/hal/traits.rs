// src/hal/traits.rs
//! Core HAL trait for streaming EEG sources

use crate::error::ErdResult;
use crate::hal::types::{ChunkPoll, StreamInfo};

/// Anything that delivers multi-channel sample chunks with markers
pub trait ChunkSource: Send {
    /// Open the source and return the stream properties
    fn connect(&mut self) -> ErdResult<StreamInfo>;

    /// Wait for the next chunk, up to the source's poll timeout
    fn next_chunk(&mut self) -> ErdResult<ChunkPoll>;

    /// Release the underlying connection or file
    fn disconnect(&mut self) -> ErdResult<()>;

    /// Properties from the last successful `connect`
    fn stream_info(&self) -> Option<&StreamInfo>;
}
