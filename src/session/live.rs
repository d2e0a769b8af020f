// src/session/live.rs
//! Live ERD session: source, assembler, calculator and sink in one loop

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::acquisition::{parse_stimulus_code, AssembledEpoch, StreamingEpochAssembler};
use crate::communication::{ResultSink, Sink, TrialResult};
use crate::config::{MarkerConfig, SystemConfig};
use crate::erd::{ChannelLayout, ErdCalculator, ErdMethod};
use crate::error::ErdResult;
use crate::hal::{ChunkPoll, ChunkSource, DataSource, StreamInfo};
use crate::summary::TrialRecord;
use crate::utils::time::{SystemTimeProvider, TimeProvider};

/// Counters and trials accumulated by a live session
#[derive(Debug, Clone, Default, Serialize)]
pub struct LiveReport {
    pub chunks: u64,
    pub samples: u64,
    /// Epochs that produced an ERD value
    pub processed: usize,
    /// Epochs whose ERD was undefined
    pub failed: usize,
    pub pruned: usize,
    pub dropped_chunks: usize,
    pub source_errors: usize,
    pub sink_errors: usize,
    pub max_latency_ms: f64,
    pub trials: Vec<TrialRecord>,
}

/// Outcome of one [`LiveSession::step`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStep {
    /// A chunk was ingested, completing `epochs` epochs
    Chunk { epochs: usize },
    Idle,
    Finished,
}

pub struct LiveSession {
    source: DataSource,
    sink: Sink,
    info: StreamInfo,
    layout: ChannelLayout,
    assembler: StreamingEpochAssembler,
    calculator: Arc<ErdCalculator>,
    method: ErdMethod,
    markers: MarkerConfig,
    latency_target: Duration,
    poll_interval: Duration,
    time: Arc<dyn TimeProvider>,
    report: LiveReport,
}

impl LiveSession {
    /// Connect the source and build the processing chain for its stream.
    ///
    /// Configuration problems (unknown focus channels, invalid method
    /// parameters for the epoch windows) fail here, before any data is read.
    pub fn connect(config: &SystemConfig, mut source: DataSource, sink: Sink) -> ErdResult<Self> {
        let info = source.connect()?;
        let layout = ChannelLayout::resolve(&info.channel_names, &config.channels.bad, &config.channels.focus)?;
        let calculator = ErdCalculator::from_config(config, info.sampling_rate, &layout)?;
        let method = config.erd.method();
        calculator.validate_method(method)?;

        let buffer_samples = config.live.buffer_samples(info.sampling_rate, config.epoch_seconds());
        let assembler = StreamingEpochAssembler::new(
            layout.clean_count(),
            buffer_samples,
            calculator.samples_before(),
            calculator.samples_after(),
            &config.markers.focus,
        )?;

        info!(
            source = ?source.kind(),
            method = %method,
            clean_channels = layout.clean_count(),
            focus = ?layout.focus_names(),
            buffer_samples,
            "Live session ready"
        );

        Ok(Self {
            source,
            sink,
            info,
            layout,
            assembler,
            calculator: Arc::new(calculator),
            method,
            markers: config.markers.clone(),
            latency_target: Duration::from_millis(config.live.latency_target_ms),
            poll_interval: Duration::from_millis(config.live.poll_interval_ms),
            time: Arc::new(SystemTimeProvider),
            report: LiveReport::default(),
        })
    }

    pub fn with_time_provider(mut self, time: Arc<dyn TimeProvider>) -> Self {
        self.time = time;
        self
    }

    pub fn stream_info(&self) -> &StreamInfo {
        &self.info
    }

    pub fn layout(&self) -> &ChannelLayout {
        &self.layout
    }

    pub fn calculator(&self) -> Arc<ErdCalculator> {
        Arc::clone(&self.calculator)
    }

    pub fn assembler(&self) -> &StreamingEpochAssembler {
        &self.assembler
    }

    pub fn report(&self) -> &LiveReport {
        &self.report
    }

    /// Poll the source once and process every epoch that became complete.
    ///
    /// Only configuration errors are returned. Source, data and sink failures
    /// are logged and counted.
    pub fn step(&mut self) -> ErdResult<SessionStep> {
        let chunk = match self.source.next_chunk() {
            Ok(ChunkPoll::Data(chunk)) => chunk,
            Ok(ChunkPoll::Pending) => return Ok(SessionStep::Idle),
            Ok(ChunkPoll::Finished) => return Ok(SessionStep::Finished),
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                warn!(error = %e, "Source error, waiting for the next chunk");
                self.report.source_errors += 1;
                return Ok(SessionStep::Idle);
            }
        };

        let clean = match self.layout.select_clean(chunk.data.view()) {
            Ok(clean) => clean,
            Err(e) => {
                warn!(error = %e, "Dropping malformed chunk");
                self.report.dropped_chunks += 1;
                return Ok(SessionStep::Idle);
            }
        };

        let outcome = match self.assembler.push_chunk(clean.view(), &chunk.markers) {
            Ok(outcome) => outcome,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                warn!(error = %e, "Dropping chunk the assembler rejected");
                self.report.dropped_chunks += 1;
                return Ok(SessionStep::Idle);
            }
        };
        self.report.chunks += 1;
        self.report.samples += chunk.samples() as u64;
        self.report.pruned += outcome.pruned.len();

        let epochs = outcome.epochs.len();
        for epoch in outcome.epochs {
            self.process_epoch(epoch)?;
        }
        Ok(SessionStep::Chunk { epochs })
    }

    fn process_epoch(&mut self, epoch: AssembledEpoch) -> ErdResult<()> {
        let started = Instant::now();
        let erd = match self.calculator.calculate(epoch.data.view(), self.method, true) {
            Ok(erd) => erd,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                warn!(marker = %epoch.marker.description, error = %e, "ERD calculation failed");
                None
            }
        };
        let latency = started.elapsed();
        let latency_ms = latency.as_secs_f64() * 1000.0;
        self.report.max_latency_ms = self.report.max_latency_ms.max(latency_ms);
        if latency > self.latency_target {
            warn!(
                marker = %epoch.marker.description,
                latency_ms,
                target_ms = self.latency_target.as_millis() as u64,
                "Epoch processing exceeded latency target"
            );
        }

        let value = erd.as_ref().and_then(|output| output.as_mean());
        match value {
            Some(value) => {
                self.report.processed += 1;
                debug!(
                    marker = %epoch.marker.description,
                    stream_position = epoch.marker.stream_position,
                    erd = value,
                    latency_ms,
                    "Epoch processed"
                );
            }
            None => {
                self.report.failed += 1;
                warn!(marker = %epoch.marker.description, "ERD undefined for epoch");
            }
        }

        let timestamp = self.time.now_secs();
        let result = TrialResult::new(
            timestamp,
            epoch.marker.description.clone(),
            epoch.marker.stream_position,
            self.method,
            erd,
            self.layout.clean_names().to_vec(),
        );
        if let Err(e) = self.sink.publish(&result) {
            warn!(error = %e, "Failed to publish result");
            self.report.sink_errors += 1;
        }

        let code = parse_stimulus_code(&epoch.marker.description);
        let category = code.and_then(|c| self.markers.category_of(c));
        let mut values = BTreeMap::new();
        values.insert(self.method.to_string(), value);
        let trial_index = self.report.trials.len();
        self.report.trials.push(TrialRecord {
            trial_index,
            description: epoch.marker.description,
            code,
            category,
            erd: values,
            timestamp,
        });
        Ok(())
    }

    /// Step until the source finishes or `stop` is set, then shut down
    pub fn run(&mut self, stop: &AtomicBool) -> ErdResult<LiveReport> {
        while !stop.load(Ordering::SeqCst) {
            match self.step()? {
                SessionStep::Finished => break,
                SessionStep::Idle => thread::sleep(self.poll_interval),
                SessionStep::Chunk { .. } => {}
            }
        }
        Ok(self.finish())
    }

    /// Disconnect the source, close the sink and hand back the report
    pub fn finish(&mut self) -> LiveReport {
        if let Err(e) = self.source.disconnect() {
            warn!(error = %e, "Source disconnect failed");
        }
        if let Err(e) = self.sink.close() {
            error!(error = %e, "Sink close failed");
        }
        let stats = self.assembler.stats();
        info!(
            chunks = self.report.chunks,
            processed = self.report.processed,
            failed = self.report.failed,
            pruned = self.report.pruned,
            pending = self.assembler.pending().len(),
            registered = stats.registered,
            max_latency_ms = self.report.max_latency_ms,
            "Live session finished"
        );
        std::mem::take(&mut self.report)
    }
}
