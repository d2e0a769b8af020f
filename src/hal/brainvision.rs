// src/hal/brainvision.rs
//! BrainVision Core Data Format reader (`.vhdr` / `.vmrk` / `.eeg`)

use std::collections::HashMap;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, ReadBytesExt};
use ndarray::Array2;
use tracing::{debug, info};

use crate::acquisition::Marker;
use crate::error::{ErdErrorBuilder, ErdResult, IntoErdError};
use crate::hal::types::StreamInfo;

/// Sample encoding in the binary data file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryFormat {
    Int16,
    Int32,
    Float32,
}

impl BinaryFormat {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "INT_16" => Some(BinaryFormat::Int16),
            "INT_32" => Some(BinaryFormat::Int32),
            "IEEE_FLOAT_32" => Some(BinaryFormat::Float32),
            _ => None,
        }
    }

    pub fn bytes_per_sample(self) -> usize {
        match self {
            BinaryFormat::Int16 => 2,
            BinaryFormat::Int32 | BinaryFormat::Float32 => 4,
        }
    }
}

/// Parsed `.vhdr` header
#[derive(Debug, Clone, PartialEq)]
pub struct VhdrHeader {
    pub data_file: String,
    pub marker_file: Option<String>,
    pub sampling_interval_us: f64,
    pub binary_format: BinaryFormat,
    pub channel_names: Vec<String>,
    pub resolutions: Vec<f64>,
}

impl VhdrHeader {
    pub fn stream_info(&self) -> StreamInfo {
        StreamInfo {
            channel_names: self.channel_names.clone(),
            sampling_rate: 1_000_000.0 / self.sampling_interval_us,
            resolutions: self.resolutions.clone(),
        }
    }
}

/// INI-style sections, keys in file order
fn parse_sections(text: &str) -> HashMap<String, Vec<(String, String)>> {
    let mut sections: HashMap<String, Vec<(String, String)>> = HashMap::new();
    let mut current = String::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with(';') {
            continue;
        }
        if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            current = name.trim().to_string();
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            sections
                .entry(current.clone())
                .or_default()
                .push((key.trim().to_string(), value.trim().to_string()));
        }
    }
    sections
}

fn header_error(reason: impl Into<String>) -> crate::error::ErdError {
    ErdErrorBuilder::new("brainvision", "parse_vhdr").invalid_data("vhdr header", reason)
}

pub fn parse_vhdr(text: &str) -> ErdResult<VhdrHeader> {
    let sections = parse_sections(text);
    let common = sections
        .get("Common Infos")
        .ok_or_else(|| header_error("Missing [Common Infos] section"))?;
    let lookup = |entries: &[(String, String)], key: &str| -> Option<String> {
        entries.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone())
    };

    let data_file = lookup(common, "DataFile").ok_or_else(|| header_error("Missing DataFile"))?;
    let marker_file = lookup(common, "MarkerFile");
    let channels: usize = lookup(common, "NumberOfChannels")
        .and_then(|v| v.parse().ok())
        .filter(|&n| n > 0)
        .ok_or_else(|| header_error("Missing or invalid NumberOfChannels"))?;
    let sampling_interval_us: f64 = lookup(common, "SamplingInterval")
        .and_then(|v| v.parse().ok())
        .filter(|&v: &f64| v > 0.0)
        .ok_or_else(|| header_error("Missing or invalid SamplingInterval"))?;

    if let Some(orientation) = lookup(common, "DataOrientation") {
        if !orientation.eq_ignore_ascii_case("MULTIPLEXED") {
            return Err(header_error(format!("Unsupported DataOrientation {}", orientation)));
        }
    }

    let binary_format = match sections.get("Binary Infos").and_then(|b| lookup(b, "BinaryFormat")) {
        Some(value) => {
            BinaryFormat::parse(&value).ok_or_else(|| header_error(format!("Unsupported BinaryFormat {}", value)))?
        }
        None => BinaryFormat::Int16,
    };

    let channel_entries = sections
        .get("Channel Infos")
        .ok_or_else(|| header_error("Missing [Channel Infos] section"))?;
    let mut channel_names = Vec::with_capacity(channels);
    let mut resolutions = Vec::with_capacity(channels);
    for index in 1..=channels {
        let entry = lookup(channel_entries, &format!("Ch{}", index))
            .ok_or_else(|| header_error(format!("Missing entry Ch{}", index)))?;
        // Name,Reference,Resolution,Unit with "\1" standing for a literal comma
        let fields: Vec<String> = entry.split(',').map(|f| f.replace("\\1", ",")).collect();
        channel_names.push(fields[0].clone());
        let resolution = fields
            .get(2)
            .filter(|f| !f.trim().is_empty())
            .map(|f| f.trim().parse::<f64>())
            .transpose()
            .map_err(|_| header_error(format!("Invalid resolution for Ch{}", index)))?
            .unwrap_or(1.0);
        resolutions.push(resolution);
    }

    Ok(VhdrHeader {
        data_file,
        marker_file,
        sampling_interval_us,
        binary_format,
        channel_names,
        resolutions,
    })
}

/// Markers from a `.vmrk` file with 0-based positions
pub fn parse_vmrk(text: &str) -> ErdResult<Vec<Marker>> {
    let sections = parse_sections(text);
    let entries = match sections.get("Marker Infos") {
        Some(entries) => entries,
        None => return Ok(Vec::new()),
    };

    let mut markers = Vec::with_capacity(entries.len());
    for (key, value) in entries {
        let fields: Vec<&str> = value.split(',').collect();
        if fields.len() < 5 {
            return Err(ErdErrorBuilder::new("brainvision", "parse_vmrk")
                .invalid_data("vmrk marker", format!("{} has {} fields", key, fields.len())));
        }
        let invalid =
            || ErdErrorBuilder::new("brainvision", "parse_vmrk").invalid_data("vmrk marker", format!("{}={}", key, value));
        let position: u64 = fields[2].trim().parse().map_err(|_| invalid())?;
        markers.push(Marker {
            position: position.saturating_sub(1),
            points: fields[3].trim().parse().map_err(|_| invalid())?,
            channel: fields[4].trim().parse().map_err(|_| invalid())?,
            kind: fields[0].replace("\\1", ","),
            description: fields[1].replace("\\1", ","),
        });
    }
    markers.sort_by_key(|m| m.position);
    Ok(markers)
}

/// Demultiplex and scale raw samples into `(channels, samples)`
pub fn decode_samples(bytes: &[u8], format: BinaryFormat, resolutions: &[f64]) -> ErdResult<Array2<f64>> {
    let channels = resolutions.len();
    let frame = format.bytes_per_sample() * channels;
    if channels == 0 || bytes.len() % frame != 0 {
        return Err(ErdErrorBuilder::new("brainvision", "decode_samples").invalid_data(
            "eeg data",
            format!("{} bytes is not a whole number of {}-byte frames", bytes.len(), frame),
        ));
    }

    let samples = bytes.len() / frame;
    let mut data = Array2::zeros((channels, samples));
    let mut cursor = Cursor::new(bytes);
    for t in 0..samples {
        for (ch, resolution) in resolutions.iter().enumerate() {
            let raw = match format {
                BinaryFormat::Int16 => cursor.read_i16::<LittleEndian>()? as f64,
                BinaryFormat::Int32 => cursor.read_i32::<LittleEndian>()? as f64,
                BinaryFormat::Float32 => cursor.read_f32::<LittleEndian>()? as f64,
            };
            data[[ch, t]] = raw * resolution;
        }
    }
    Ok(data)
}

/// Fully loaded recording
#[derive(Debug, Clone, PartialEq)]
pub struct Recording {
    pub info: StreamInfo,
    /// `(channels, samples)` in physical units
    pub data: Array2<f64>,
    /// Markers with absolute 0-based sample positions
    pub markers: Vec<Marker>,
}

impl Recording {
    /// Load a recording from its `.vhdr` file. Data and marker paths are
    /// resolved relative to the header's directory.
    pub fn from_vhdr(path: impl AsRef<Path>) -> ErdResult<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).erd_err("brainvision", "read_vhdr")?;
        let header = parse_vhdr(&text)?;
        let dir = path.parent().map(Path::to_path_buf).unwrap_or_else(PathBuf::new);

        let bytes = fs::read(dir.join(&header.data_file)).erd_err("brainvision", "read_eeg")?;
        let data = decode_samples(&bytes, header.binary_format, &header.resolutions)?;

        let markers = match &header.marker_file {
            Some(marker_file) => {
                let text = fs::read_to_string(dir.join(marker_file)).erd_err("brainvision", "read_vmrk")?;
                parse_vmrk(&text)?
            }
            None => Vec::new(),
        };

        let info = header.stream_info();
        info!(
            path = %path.display(),
            channels = info.channel_count(),
            sampling_rate = info.sampling_rate,
            samples = data.ncols(),
            markers = markers.len(),
            "Loaded BrainVision recording"
        );
        debug!(channels = ?info.channel_names, "Recording channels");

        Ok(Self { info, data, markers })
    }

    pub fn samples(&self) -> usize {
        self.data.ncols()
    }

    pub fn duration_seconds(&self) -> f64 {
        self.samples() as f64 / self.info.sampling_rate
    }
}
