// src/hal/rda.rs
//! BrainVision Recorder Remote Data Access (RDA) client
//!
//! Every message starts with a 24-byte little-endian header: a 16-byte GUID,
//! the message size including the header, and the message type. Data
//! messages carry multiplexed samples followed by marker records.

use std::io::{Cursor, ErrorKind, Read};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::time::Duration;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use ndarray::{Array2, ArrayView2};
use tracing::{debug, info, warn};

use crate::acquisition::Marker;
use crate::config::constants::rda::*;
use crate::error::{CommunicationProtocol, ErdError, ErdErrorBuilder, ErdResult};
use crate::hal::traits::ChunkSource;
use crate::hal::types::{ChunkPoll, DataChunk, StreamInfo};

/// Decoded RDA message
#[derive(Debug, Clone, PartialEq)]
pub enum RdaMessage {
    Start(StreamInfo),
    Data(DataChunk),
    Stop,
    /// Message type this client does not handle
    Other(u32),
}

/// Incremental decoder over a byte stream.
///
/// Bytes are fed as they arrive; complete messages are taken out one at a
/// time, so a read timeout never splits a message.
#[derive(Debug, Default)]
pub struct RdaDecoder {
    buffer: Vec<u8>,
    info: Option<StreamInfo>,
    last_block: Option<u32>,
}

fn protocol_error(operation: &str, reason: impl Into<String>) -> ErdError {
    ErdErrorBuilder::new("rda", operation).protocol(reason)
}

impl RdaDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stream_info(&self) -> Option<&StreamInfo> {
        self.info.as_ref()
    }

    pub fn feed(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Bytes received but not yet decoded
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Next complete message, `None` if more bytes are needed
    pub fn next_message(&mut self) -> ErdResult<Option<RdaMessage>> {
        if self.buffer.len() < HEADER_SIZE {
            return Ok(None);
        }

        let mut header = Cursor::new(&self.buffer[16..HEADER_SIZE]);
        let size = header.read_u32::<LittleEndian>()? as usize;
        let kind = header.read_u32::<LittleEndian>()?;
        if !(HEADER_SIZE..=MAX_MESSAGE_SIZE).contains(&size) {
            // Framing is lost; drop what is buffered and resume from the next read
            let discarded = self.buffer.len();
            self.buffer.clear();
            warn!(size, discarded, "Discarding RDA bytes after invalid header");
            return Err(protocol_error("read_header", format!("Invalid message size {}", size)));
        }
        if self.buffer.len() < size {
            return Ok(None);
        }

        let message: Vec<u8> = self.buffer.drain(..size).collect();
        self.decode(kind, &message[HEADER_SIZE..]).map(Some)
    }

    /// Decode one message payload (everything after the header)
    pub fn decode(&mut self, kind: u32, payload: &[u8]) -> ErdResult<RdaMessage> {
        self.decode_inner(kind, payload).map_err(|err| match err {
            ErdError::Io { source, .. } => protocol_error("decode", format!("Truncated message: {}", source)),
            other => other,
        })
    }

    fn decode_inner(&mut self, kind: u32, payload: &[u8]) -> ErdResult<RdaMessage> {
        match kind {
            MSG_START => {
                let info = decode_start(payload)?;
                self.info = Some(info.clone());
                self.last_block = None;
                Ok(RdaMessage::Start(info))
            }
            MSG_DATA16 | MSG_DATA32 => {
                let info = self
                    .info
                    .as_ref()
                    .ok_or_else(|| protocol_error("decode_data", "Data message before start message"))?;
                let chunk = decode_data(payload, info, kind == MSG_DATA32)?;
                if let (Some(last), Some(block)) = (self.last_block, chunk.block) {
                    if block != last.wrapping_add(1) {
                        warn!(expected = last.wrapping_add(1), received = block, "Missed RDA data blocks");
                    }
                }
                self.last_block = chunk.block;
                Ok(RdaMessage::Data(chunk))
            }
            MSG_STOP => Ok(RdaMessage::Stop),
            other => Ok(RdaMessage::Other(other)),
        }
    }
}

fn decode_start(payload: &[u8]) -> ErdResult<StreamInfo> {
    let mut cursor = Cursor::new(payload);
    let channels = cursor.read_u32::<LittleEndian>()? as usize;
    let interval_us = cursor.read_f64::<LittleEndian>()?;
    if channels == 0 || !(interval_us > 0.0) {
        return Err(protocol_error(
            "decode_start",
            format!("Invalid stream properties: {} channels, {} us interval", channels, interval_us),
        ));
    }

    let mut resolutions = Vec::with_capacity(channels);
    for _ in 0..channels {
        resolutions.push(cursor.read_f64::<LittleEndian>()?);
    }

    let names_start = cursor.position() as usize;
    let channel_names: Vec<String> = payload[names_start..]
        .split(|&b| b == 0)
        .take(channels)
        .map(|name| String::from_utf8_lossy(name).into_owned())
        .collect();
    if channel_names.len() < channels {
        return Err(protocol_error(
            "decode_start",
            format!("Expected {} channel names, found {}", channels, channel_names.len()),
        ));
    }

    Ok(StreamInfo {
        channel_names,
        sampling_rate: 1_000_000.0 / interval_us,
        resolutions,
    })
}

fn decode_data(payload: &[u8], info: &StreamInfo, float32: bool) -> ErdResult<DataChunk> {
    let mut cursor = Cursor::new(payload);
    let block = cursor.read_u32::<LittleEndian>()?;
    let points = cursor.read_u32::<LittleEndian>()? as usize;
    let marker_count = cursor.read_u32::<LittleEndian>()?;

    let channels = info.channel_count();
    let sample_bytes = if float32 { 4 } else { 2 };
    let remaining = payload.len() - cursor.position() as usize;
    if points * channels * sample_bytes > remaining {
        return Err(protocol_error(
            "decode_data",
            format!("Block {} declares {} points but carries {} bytes", block, points, remaining),
        ));
    }

    let mut data = Array2::zeros((channels, points));
    for t in 0..points {
        for ch in 0..channels {
            let raw = if float32 {
                cursor.read_f32::<LittleEndian>()? as f64
            } else {
                cursor.read_i16::<LittleEndian>()? as f64
            };
            data[[ch, t]] = raw * info.resolutions[ch];
        }
    }

    let mut markers = Vec::with_capacity(marker_count as usize);
    for _ in 0..marker_count {
        let start = cursor.position() as usize;
        let size = cursor.read_u32::<LittleEndian>()? as usize;
        let position = cursor.read_u32::<LittleEndian>()?;
        let marker_points = cursor.read_u32::<LittleEndian>()?;
        let channel = cursor.read_i32::<LittleEndian>()?;
        let text_start = cursor.position() as usize;
        let end = start + size;
        if size < 16 || end > payload.len() {
            return Err(protocol_error("decode_marker", format!("Invalid marker size {}", size)));
        }
        let mut strings = payload[text_start..end]
            .split(|&b| b == 0)
            .map(|s| String::from_utf8_lossy(s).into_owned());
        let kind = strings.next().unwrap_or_default();
        let description = strings.next().unwrap_or_default();
        markers.push(Marker {
            position: position as u64,
            points: marker_points,
            channel,
            kind,
            description,
        });
        cursor.set_position(end as u64);
    }

    Ok(DataChunk {
        data,
        markers,
        block: Some(block),
    })
}

fn write_header(buf: &mut Vec<u8>, kind: u32, payload_len: usize) -> ErdResult<()> {
    buf.extend_from_slice(&GUID);
    buf.write_u32::<LittleEndian>((HEADER_SIZE + payload_len) as u32)?;
    buf.write_u32::<LittleEndian>(kind)?;
    Ok(())
}

/// Encode a start message announcing `info`
pub fn encode_start(info: &StreamInfo) -> ErdResult<Vec<u8>> {
    let mut payload = Vec::new();
    payload.write_u32::<LittleEndian>(info.channel_count() as u32)?;
    payload.write_f64::<LittleEndian>(info.sampling_interval_us())?;
    for resolution in &info.resolutions {
        payload.write_f64::<LittleEndian>(*resolution)?;
    }
    for name in &info.channel_names {
        payload.extend_from_slice(name.as_bytes());
        payload.push(0);
    }

    let mut message = Vec::with_capacity(HEADER_SIZE + payload.len());
    write_header(&mut message, MSG_START, payload.len())?;
    message.extend_from_slice(&payload);
    Ok(message)
}

/// Encode a 32-bit float data message. Samples are divided by the channel
/// resolutions so that decoding restores physical units.
pub fn encode_data32(block: u32, data: ArrayView2<f64>, markers: &[Marker], resolutions: &[f64]) -> ErdResult<Vec<u8>> {
    let mut payload = Vec::new();
    payload.write_u32::<LittleEndian>(block)?;
    payload.write_u32::<LittleEndian>(data.ncols() as u32)?;
    payload.write_u32::<LittleEndian>(markers.len() as u32)?;
    for t in 0..data.ncols() {
        for ch in 0..data.nrows() {
            let resolution = resolutions.get(ch).copied().unwrap_or(1.0);
            payload.write_f32::<LittleEndian>((data[[ch, t]] / resolution) as f32)?;
        }
    }
    for marker in markers {
        let text_len = marker.kind.len() + marker.description.len() + 2;
        payload.write_u32::<LittleEndian>((16 + text_len) as u32)?;
        payload.write_u32::<LittleEndian>(marker.position as u32)?;
        payload.write_u32::<LittleEndian>(marker.points)?;
        payload.write_i32::<LittleEndian>(marker.channel)?;
        payload.extend_from_slice(marker.kind.as_bytes());
        payload.push(0);
        payload.extend_from_slice(marker.description.as_bytes());
        payload.push(0);
    }

    let mut message = Vec::with_capacity(HEADER_SIZE + payload.len());
    write_header(&mut message, MSG_DATA32, payload.len())?;
    message.extend_from_slice(&payload);
    Ok(message)
}

pub fn encode_stop() -> ErdResult<Vec<u8>> {
    let mut message = Vec::with_capacity(HEADER_SIZE);
    write_header(&mut message, MSG_STOP, 0)?;
    Ok(message)
}

/// RDA client over TCP
pub struct RdaClient {
    address: String,
    timeout: Duration,
    stream: Option<TcpStream>,
    decoder: RdaDecoder,
    read_buffer: Vec<u8>,
    session_info: Option<StreamInfo>,
}

impl RdaClient {
    pub fn new(address: impl Into<String>, timeout: Duration) -> Self {
        Self {
            address: address.into(),
            timeout,
            stream: None,
            decoder: RdaDecoder::new(),
            read_buffer: vec![0; 64 * 1024],
            session_info: None,
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    fn comm_error(operation: &str, reason: impl Into<String>) -> ErdError {
        ErdErrorBuilder::new("rda_client", operation).communication(CommunicationProtocol::Rda, reason)
    }

    /// Read once from the socket into the decoder. `None` on timeout,
    /// `Some(0)` when the recorder closed the connection.
    fn fill(&mut self) -> ErdResult<Option<usize>> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| Self::comm_error("read", "Not connected"))?;
        match stream.read(&mut self.read_buffer) {
            Ok(n) => {
                self.decoder.feed(&self.read_buffer[..n]);
                Ok(Some(n))
            }
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => Ok(None),
            Err(e) => Err(Self::comm_error("read", e.to_string())),
        }
    }
}

impl ChunkSource for RdaClient {
    fn connect(&mut self) -> ErdResult<StreamInfo> {
        let address: SocketAddr = self.address.parse().map_err(|_| {
            ErdErrorBuilder::new("rda_client", "connect")
                .configuration(format!("Invalid receiver address {}", self.address))
        })?;
        let stream = TcpStream::connect_timeout(&address, self.timeout)
            .map_err(|e| Self::comm_error("connect", format!("{}: {}", address, e)))?;
        stream
            .set_read_timeout(Some(self.timeout))
            .map_err(|e| Self::comm_error("connect", e.to_string()))?;
        stream.set_nodelay(true).ok();
        self.stream = Some(stream);
        self.decoder = RdaDecoder::new();
        info!(address = %address, "Connected to RDA server");

        loop {
            match self.decoder.next_message()? {
                Some(RdaMessage::Start(info)) => {
                    info!(
                        channels = info.channel_count(),
                        sampling_rate = info.sampling_rate,
                        "RDA stream started"
                    );
                    self.session_info = Some(info.clone());
                    return Ok(info);
                }
                Some(other) => debug!(message = ?other, "Discarding message before start"),
                None => match self.fill()? {
                    Some(0) => return Err(Self::comm_error("connect", "Connection closed before start message")),
                    Some(_) => {}
                    None => return Err(Self::comm_error("connect", "Timed out waiting for start message")),
                },
            }
        }
    }

    fn next_chunk(&mut self) -> ErdResult<ChunkPoll> {
        loop {
            match self.decoder.next_message()? {
                Some(RdaMessage::Data(chunk)) => return Ok(ChunkPoll::Data(chunk)),
                Some(RdaMessage::Stop) => {
                    info!("RDA stream stopped");
                    return Ok(ChunkPoll::Finished);
                }
                Some(RdaMessage::Start(info)) => {
                    if self.session_info.as_ref() == Some(&info) {
                        info!(channels = info.channel_count(), "RDA stream restarted");
                    } else {
                        // Layout and epoch sizes were derived from the first start message
                        warn!(
                            channels = info.channel_count(),
                            sampling_rate = info.sampling_rate,
                            "RDA stream properties changed, ending stream"
                        );
                        return Ok(ChunkPoll::Finished);
                    }
                }
                Some(RdaMessage::Other(kind)) => debug!(kind, "Ignoring RDA message"),
                None => match self.fill()? {
                    Some(0) => {
                        warn!("RDA server closed the connection");
                        return Ok(ChunkPoll::Finished);
                    }
                    Some(_) => {}
                    None => return Ok(ChunkPoll::Pending),
                },
            }
        }
    }

    fn disconnect(&mut self) -> ErdResult<()> {
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.shutdown(Shutdown::Both) {
                debug!(error = %e, "RDA socket shutdown failed");
            }
        }
        Ok(())
    }

    fn stream_info(&self) -> Option<&StreamInfo> {
        self.decoder.stream_info()
    }
}
