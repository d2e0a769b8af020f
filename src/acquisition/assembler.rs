// src/acquisition/assembler.rs
//! Streaming epoch assembler
//!
//! Markers move through three states: registered (waiting for data),
//! extracted (handed out as an epoch) or pruned (the buffer moved past them).
//! The assembler is driven by one consumer loop and never blocks.

use std::collections::HashSet;

use ndarray::{Array2, ArrayView2};
use serde::Serialize;
use tracing::{debug, trace, warn};

use crate::acquisition::marker::Marker;
use crate::acquisition::ring_buffer::{CircularSampleBuffer, RingBufferError};
use crate::error::{ErdError, ErdErrorBuilder, ErdResult};

/// Marker waiting for its epoch to be fully buffered
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingMarker {
    pub description: String,
    /// Absolute stream position of the marker sample
    pub stream_position: u64,
}

/// Epoch of shape `(channels, samples_before + samples_after)` for one marker
#[derive(Debug, Clone)]
pub struct AssembledEpoch {
    pub marker: PendingMarker,
    pub data: Array2<f64>,
}

/// What happened while ingesting one chunk
#[derive(Debug, Default)]
pub struct ChunkReport {
    pub registered: usize,
    pub ignored: usize,
    pub epochs: Vec<AssembledEpoch>,
    pub pruned: Vec<PendingMarker>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AssemblerStats {
    pub chunks: u64,
    pub samples: u64,
    pub registered: u64,
    pub extracted: u64,
    pub pruned: u64,
}

#[derive(Debug)]
pub struct StreamingEpochAssembler {
    buffer: CircularSampleBuffer,
    samples_before: usize,
    samples_after: usize,
    focus_markers: HashSet<String>,
    pending: Vec<PendingMarker>,
    stats: AssemblerStats,
}

impl StreamingEpochAssembler {
    /// `buffer_samples` must be larger than one epoch
    pub fn new<S: AsRef<str>>(
        channels: usize,
        buffer_samples: usize,
        samples_before: usize,
        samples_after: usize,
        focus_markers: &[S],
    ) -> ErdResult<Self> {
        let builder = || ErdErrorBuilder::new("epoch_assembler", "new");
        let epoch_len = samples_before + samples_after;
        if buffer_samples <= epoch_len {
            return Err(builder().configuration(format!(
                "Buffer of {} samples cannot hold a {}-sample epoch",
                buffer_samples, epoch_len
            )));
        }
        let buffer = CircularSampleBuffer::new(channels, buffer_samples)
            .map_err(|e| builder().configuration(e.to_string()))?;

        Ok(Self {
            buffer,
            samples_before,
            samples_after,
            focus_markers: focus_markers.iter().map(|m| m.as_ref().to_string()).collect(),
            pending: Vec::new(),
            stats: AssemblerStats::default(),
        })
    }

    pub fn total_samples_streamed(&self) -> u64 {
        self.buffer.total_written()
    }

    pub fn oldest_recoverable_position(&self) -> u64 {
        self.buffer.oldest_position()
    }

    pub fn pending(&self) -> &[PendingMarker] {
        &self.pending
    }

    pub fn stats(&self) -> AssemblerStats {
        self.stats
    }

    pub fn buffer_samples(&self) -> usize {
        self.buffer.capacity()
    }

    pub fn epoch_len(&self) -> usize {
        self.samples_before + self.samples_after
    }

    /// Ingest a `(channels, n)` chunk and its markers (positions relative to the
    /// chunk start), returning every epoch that became complete.
    pub fn push_chunk(&mut self, chunk: ArrayView2<f64>, markers: &[Marker]) -> ErdResult<ChunkReport> {
        let chunk_start = self.buffer.total_written();
        self.buffer.push(chunk).map_err(|e| {
            ErdErrorBuilder::new("epoch_assembler", "push_chunk").invalid_data("data chunk", e.to_string())
        })?;
        self.stats.chunks += 1;
        self.stats.samples += chunk.ncols() as u64;

        let mut report = ChunkReport::default();
        for marker in markers {
            if !self.focus_markers.contains(&marker.description) {
                trace!(marker = %marker.description, "Ignoring marker outside focus set");
                report.ignored += 1;
                continue;
            }
            let stream_position = chunk_start + marker.position;
            debug!(marker = %marker.description, stream_position, "Registered marker");
            self.pending.push(PendingMarker {
                description: marker.description.clone(),
                stream_position,
            });
            report.registered += 1;
        }
        self.stats.registered += report.registered as u64;

        self.drain_pending(&mut report)?;
        Ok(report)
    }

    fn drain_pending(&mut self, report: &mut ChunkReport) -> ErdResult<()> {
        let total = self.buffer.total_written();
        let oldest = self.buffer.oldest_position();
        let before = self.samples_before as u64;
        let after = self.samples_after as u64;

        let mut still_pending = Vec::with_capacity(self.pending.len());
        for marker in self.pending.drain(..) {
            let position = marker.stream_position;
            let complete = position + after < total;
            let recoverable = position >= before && position - before >= oldest;

            if complete && recoverable {
                let data = self
                    .buffer
                    .read(position - before, self.samples_before + self.samples_after)
                    .map_err(|e: RingBufferError| ErdError::InvalidData {
                        data_type: "epoch".to_string(),
                        reason: e.to_string(),
                        context: crate::error_context!("epoch_assembler", "extract"),
                    })?;
                debug!(marker = %marker.description, stream_position = position, "Epoch extracted");
                report.epochs.push(AssembledEpoch { marker, data });
            } else if oldest > position + after {
                warn!(
                    marker = %marker.description,
                    stream_position = position,
                    oldest_recoverable = oldest,
                    "Pruned marker whose epoch is no longer recoverable"
                );
                report.pruned.push(marker);
            } else {
                still_pending.push(marker);
            }
        }
        self.pending = still_pending;

        self.stats.extracted += report.epochs.len() as u64;
        self.stats.pruned += report.pruned.len() as u64;
        Ok(())
    }
}
