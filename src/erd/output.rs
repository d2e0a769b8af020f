// src/erd/output.rs
//! ERD result values

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

/// Per-channel ERD values in clean channel order. `NaN` marks a channel
/// whose ERD is undefined.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelErd {
    names: Vec<String>,
    values: Vec<f64>,
}

impl ChannelErd {
    pub fn new(names: Vec<String>, values: Vec<f64>) -> Self {
        debug_assert_eq!(names.len(), values.len());
        Self { names, values }
    }

    pub fn get(&self, channel: &str) -> Option<f64> {
        self.names.iter().position(|name| name == channel).map(|i| self.values[i])
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.names.iter().map(String::as_str).zip(self.values.iter().copied())
    }
}

impl Serialize for ChannelErd {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (name, value) in self.iter() {
            let value = if value.is_finite() { Some(value) } else { None };
            map.serialize_entry(name, &value)?;
        }
        map.end()
    }
}

/// Result of one ERD calculation
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ErdOutput {
    /// Mean over the focus channels with defined values
    Mean(f64),
    PerChannel(ChannelErd),
}

impl ErdOutput {
    pub fn as_mean(&self) -> Option<f64> {
        match self {
            ErdOutput::Mean(value) => Some(*value),
            ErdOutput::PerChannel(_) => None,
        }
    }

    pub fn as_channels(&self) -> Option<&ChannelErd> {
        match self {
            ErdOutput::PerChannel(channels) => Some(channels),
            ErdOutput::Mean(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_lookup() {
        let erd = ChannelErd::new(vec!["C3".into(), "C4".into()], vec![-20.0, f64::NAN]);
        assert_eq!(erd.get("C3"), Some(-20.0));
        assert!(erd.get("C4").unwrap().is_nan());
        assert_eq!(erd.get("Cz"), None);
        assert_eq!(erd.len(), 2);
    }

    #[test]
    fn test_serialization() {
        let mean = ErdOutput::Mean(-12.5);
        assert_eq!(serde_json::to_string(&mean).unwrap(), "-12.5");

        let channels = ErdOutput::PerChannel(ChannelErd::new(
            vec!["C3".into(), "C4".into()],
            vec![-20.0, f64::NAN],
        ));
        assert_eq!(serde_json::to_string(&channels).unwrap(), r#"{"C3":-20.0,"C4":null}"#);
    }
}
