// src/acquisition/mod.rs
//! Epoch acquisition from streamed chunks and loaded recordings

pub mod assembler;
pub mod batch;
pub mod marker;
pub mod ring_buffer;

pub use assembler::{AssembledEpoch, AssemblerStats, ChunkReport, PendingMarker, StreamingEpochAssembler};
pub use batch::{BatchEpochExtractor, ExtractedEpoch};
pub use marker::{parse_stimulus_code, Marker};
pub use ring_buffer::{CircularSampleBuffer, RingBufferError};
