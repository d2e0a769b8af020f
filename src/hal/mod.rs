// src/hal/mod.rs
//! Data sources for EEG streams and recordings
//!
//! Live code talks to a [`ChunkSource`]. The concrete variant is picked once
//! when the session is built and wrapped in [`DataSource`].

pub mod brainvision;
pub mod rda;
pub mod replay;
pub mod simulator;
pub mod traits;
pub mod types;

pub use brainvision::{BinaryFormat, Recording, VhdrHeader};
pub use rda::{RdaClient, RdaDecoder, RdaMessage};
pub use replay::ReplaySource;
pub use simulator::{EegSimulator, SimulatorConfig};
pub use traits::*;
pub use types::*;

use crate::error::ErdResult;

/// The source variants a session can run on
pub enum DataSource {
    Rda(RdaClient),
    Replay(ReplaySource),
    Simulated(EegSimulator),
}

impl DataSource {
    pub fn kind(&self) -> SourceKind {
        match self {
            DataSource::Rda(_) => SourceKind::Rda,
            DataSource::Replay(_) => SourceKind::Replay,
            DataSource::Simulated(_) => SourceKind::Simulated,
        }
    }

    fn inner(&mut self) -> &mut dyn ChunkSource {
        match self {
            DataSource::Rda(source) => source,
            DataSource::Replay(source) => source,
            DataSource::Simulated(source) => source,
        }
    }
}

impl ChunkSource for DataSource {
    fn connect(&mut self) -> ErdResult<StreamInfo> {
        self.inner().connect()
    }

    fn next_chunk(&mut self) -> ErdResult<ChunkPoll> {
        self.inner().next_chunk()
    }

    fn disconnect(&mut self) -> ErdResult<()> {
        self.inner().disconnect()
    }

    fn stream_info(&self) -> Option<&StreamInfo> {
        match self {
            DataSource::Rda(source) => source.stream_info(),
            DataSource::Replay(source) => source.stream_info(),
            DataSource::Simulated(source) => source.stream_info(),
        }
    }
}

impl From<RdaClient> for DataSource {
    fn from(source: RdaClient) -> Self {
        DataSource::Rda(source)
    }
}

impl From<ReplaySource> for DataSource {
    fn from(source: ReplaySource) -> Self {
        DataSource::Replay(source)
    }
}

impl From<EegSimulator> for DataSource {
    fn from(source: EegSimulator) -> Self {
        DataSource::Simulated(source)
    }
}
