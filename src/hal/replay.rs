// src/hal/replay.rs
//! Replays a loaded recording as a chunked stream

use std::thread;
use std::time::{Duration, Instant};

use ndarray::s;
use tracing::info;

use crate::config::constants::live::REPLAY_CHUNKS_PER_SECOND;
use crate::error::{ErdErrorBuilder, ErdResult};
use crate::hal::brainvision::Recording;
use crate::hal::traits::ChunkSource;
use crate::hal::types::{ChunkPoll, DataChunk, StreamInfo};

/// Streams a [`Recording`] in fixed-size chunks with chunk-relative markers
pub struct ReplaySource {
    recording: Recording,
    chunk_samples: usize,
    position: usize,
    block: u32,
    realtime: bool,
    started: Option<Instant>,
    connected: bool,
}

impl ReplaySource {
    /// Chunks of `sampling_rate / 50` samples, delivered as fast as polled
    pub fn new(recording: Recording) -> Self {
        let chunk_samples =
            ((recording.info.sampling_rate / REPLAY_CHUNKS_PER_SECOND as f64).round() as usize).max(1);
        Self {
            recording,
            chunk_samples,
            position: 0,
            block: 0,
            realtime: false,
            started: None,
            connected: false,
        }
    }

    pub fn with_chunk_samples(mut self, chunk_samples: usize) -> Self {
        self.chunk_samples = chunk_samples.max(1);
        self
    }

    /// Pace chunks at the recording's sampling rate
    pub fn with_realtime(mut self, realtime: bool) -> Self {
        self.realtime = realtime;
        self
    }

    pub fn chunk_samples(&self) -> usize {
        self.chunk_samples
    }

    /// Samples delivered so far
    pub fn position(&self) -> usize {
        self.position
    }

    fn pace(&mut self, end: usize) {
        let started = *self.started.get_or_insert_with(Instant::now);
        let due = started + Duration::from_secs_f64(end as f64 / self.recording.info.sampling_rate);
        let now = Instant::now();
        if due > now {
            thread::sleep(due - now);
        }
    }
}

impl ChunkSource for ReplaySource {
    fn connect(&mut self) -> ErdResult<StreamInfo> {
        self.connected = true;
        self.position = 0;
        self.block = 0;
        self.started = None;
        info!(
            samples = self.recording.samples(),
            chunk_samples = self.chunk_samples,
            realtime = self.realtime,
            "Replaying recording"
        );
        Ok(self.recording.info.clone())
    }

    fn next_chunk(&mut self) -> ErdResult<ChunkPoll> {
        if !self.connected {
            return Err(ErdErrorBuilder::new("replay", "next_chunk").configuration("Replay source is not connected"));
        }
        let total = self.recording.samples();
        if self.position >= total {
            return Ok(ChunkPoll::Finished);
        }

        let start = self.position;
        let end = (start + self.chunk_samples).min(total);
        if self.realtime {
            self.pace(end);
        }

        let data = self.recording.data.slice(s![.., start..end]).to_owned();
        let markers = self
            .recording
            .markers
            .iter()
            .filter(|m| (start as u64..end as u64).contains(&m.position))
            .map(|m| m.shifted(-(start as i64)))
            .collect();

        self.position = end;
        let chunk = DataChunk {
            data,
            markers,
            block: Some(self.block),
        };
        self.block = self.block.wrapping_add(1);
        Ok(ChunkPoll::Data(chunk))
    }

    fn disconnect(&mut self) -> ErdResult<()> {
        self.connected = false;
        Ok(())
    }

    fn stream_info(&self) -> Option<&StreamInfo> {
        self.connected.then_some(&self.recording.info)
    }
}
