// src/acquisition/ring_buffer.rs
//! Multi-channel circular sample buffer addressed by absolute stream position

use ndarray::{s, Array2, ArrayView2};
use thiserror::Error;

/// Ring buffer error types
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RingBufferError {
    #[error("Invalid buffer shape: {channels} channels x {capacity} samples")]
    InvalidCapacity { channels: usize, capacity: usize },

    #[error("Chunk has {actual} channels, buffer holds {expected}")]
    ChannelMismatch { expected: usize, actual: usize },

    #[error("Range starting at {start} was overwritten (oldest recoverable sample is {oldest})")]
    Overwritten { start: u64, oldest: u64 },

    #[error("Range ending at {end} is not buffered yet ({written} samples streamed)")]
    NotYetAvailable { end: u64, written: u64 },

    #[error("Read of {len} samples exceeds capacity {capacity}")]
    TooLong { len: usize, capacity: usize },
}

/// Fixed-size `(channels, capacity)` buffer holding the most recent samples.
///
/// Stream position `p` lives in column `p % capacity`. Writes never block,
/// old data is overwritten.
#[derive(Debug, Clone)]
pub struct CircularSampleBuffer {
    data: Array2<f64>,
    capacity: usize,
    written: u64,
}

impl CircularSampleBuffer {
    pub fn new(channels: usize, capacity: usize) -> Result<Self, RingBufferError> {
        if channels == 0 || capacity == 0 {
            return Err(RingBufferError::InvalidCapacity { channels, capacity });
        }
        Ok(Self {
            data: Array2::zeros((channels, capacity)),
            capacity,
            written: 0,
        })
    }

    pub fn channels(&self) -> usize {
        self.data.nrows()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total samples ever written
    pub fn total_written(&self) -> u64 {
        self.written
    }

    /// Oldest stream position still held in the buffer
    pub fn oldest_position(&self) -> u64 {
        self.written.saturating_sub(self.capacity as u64)
    }

    /// Column index of a stream position
    pub fn buffer_index(&self, stream_position: u64) -> usize {
        (stream_position % self.capacity as u64) as usize
    }

    /// Append a `(channels, n)` chunk with wraparound
    pub fn push(&mut self, chunk: ArrayView2<f64>) -> Result<(), RingBufferError> {
        if chunk.nrows() != self.channels() {
            return Err(RingBufferError::ChannelMismatch {
                expected: self.channels(),
                actual: chunk.nrows(),
            });
        }

        let n = chunk.ncols();
        // Only the newest `capacity` samples survive
        let skip = n.saturating_sub(self.capacity);
        let tail = chunk.slice(s![.., skip..]);
        let mut position = self.written + skip as u64;
        let mut offset = 0;
        while offset < tail.ncols() {
            let start = self.buffer_index(position);
            let run = (self.capacity - start).min(tail.ncols() - offset);
            self.data
                .slice_mut(s![.., start..start + run])
                .assign(&tail.slice(s![.., offset..offset + run]));
            offset += run;
            position += run as u64;
        }

        self.written += n as u64;
        Ok(())
    }

    /// Copy `len` samples starting at stream position `start`
    pub fn read(&self, start: u64, len: usize) -> Result<Array2<f64>, RingBufferError> {
        if len > self.capacity {
            return Err(RingBufferError::TooLong {
                len,
                capacity: self.capacity,
            });
        }
        let end = start + len as u64;
        if end > self.written {
            return Err(RingBufferError::NotYetAvailable {
                end,
                written: self.written,
            });
        }
        let oldest = self.oldest_position();
        if start < oldest {
            return Err(RingBufferError::Overwritten { start, oldest });
        }

        let mut out = Array2::zeros((self.channels(), len));
        let first = self.buffer_index(start);
        let head = (self.capacity - first).min(len);
        out.slice_mut(s![.., ..head]).assign(&self.data.slice(s![.., first..first + head]));
        if head < len {
            out.slice_mut(s![.., head..]).assign(&self.data.slice(s![.., ..len - head]));
        }
        Ok(out)
    }
}
