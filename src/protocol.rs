//! Wire messages pushed by the acoustic feed
//!
//! The upstream service broadcasts JSON text frames tagged by a `type` field.
//! Only the two update shapes are meaningful to the renderers; anything else
//! decodes to [`FeedMessage::Unknown`] and is dropped by the client.

use serde::{Deserialize, Serialize};

/// Messages received over the acoustic WebSocket
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeedMessage {
    /// New time-domain window
    WaveformUpdate {
        waveform: WaveformPayload,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        source: Option<SourceInfo>,
    },
    /// New spectrogram matrix, pre-scaled to 0..=255 by the producer
    SpectrogramUpdate {
        spectrogram: Vec<Vec<f64>>,
        /// Absent when the axes did not change
        #[serde(default, skip_serializing_if = "Option::is_none")]
        spectrogram_meta: Option<SpectrogramMeta>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        source: Option<SourceInfo>,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct WaveformPayload {
    #[serde(default)]
    pub samples: Vec<f64>,
    #[serde(default)]
    pub values: Vec<f64>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct SpectrogramMeta {
    #[serde(default)]
    pub frequencies: Vec<f64>,
    #[serde(default)]
    pub times: Vec<f64>,
}

/// Where the producer cut the current window from
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SourceInfo {
    pub file: String,
    pub fs: f64,
    pub start_index: u64,
    pub end_index: u64,
}

impl FeedMessage {
    /// Create a waveform update
    #[cfg(test)]
    pub fn new_waveform(samples: Vec<f64>, values: Vec<f64>) -> Self {
        FeedMessage::WaveformUpdate {
            waveform: WaveformPayload { samples, values },
            source: None,
        }
    }

    /// Create a spectrogram update
    #[cfg(test)]
    pub fn new_spectrogram(
        spectrogram: Vec<Vec<f64>>,
        frequencies: Vec<f64>,
        times: Vec<f64>,
    ) -> Self {
        FeedMessage::SpectrogramUpdate {
            spectrogram,
            spectrogram_meta: Some(SpectrogramMeta { frequencies, times }),
            source: None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            FeedMessage::WaveformUpdate { .. } => "waveform_update",
            FeedMessage::SpectrogramUpdate { .. } => "spectrogram_update",
            FeedMessage::Unknown => "unknown",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_waveform_update_ignores_extra_fields() {
        let json = r#"{
            "type": "waveform_update",
            "waveform": {"samples": [0.0, 0.5], "values": [0.1, -0.2]},
            "spectrogram_meta": {"frequencies": [0.0], "times": [0.0]},
            "source": {"file": "a.csv", "fs": 51200.0, "start_index": 0, "end_index": 10240}
        }"#;

        let message: FeedMessage = serde_json::from_str(json).unwrap();
        match message {
            FeedMessage::WaveformUpdate { waveform, source } => {
                assert_eq!(waveform.samples, vec![0.0, 0.5]);
                assert_eq!(waveform.values, vec![0.1, -0.2]);
                assert_eq!(source.unwrap().file, "a.csv");
            }
            other => panic!("Wrong message type: {:?}", other),
        }
    }

    #[test]
    fn test_decode_spectrogram_update_without_meta() {
        let json = r#"{"type": "spectrogram_update", "spectrogram": [[1, 2], [3, 4]]}"#;

        let message: FeedMessage = serde_json::from_str(json).unwrap();
        match message {
            FeedMessage::SpectrogramUpdate {
                spectrogram,
                spectrogram_meta,
                ..
            } => {
                assert_eq!(spectrogram, vec![vec![1.0, 2.0], vec![3.0, 4.0]]);
                assert_eq!(spectrogram_meta, None);
            }
            other => panic!("Wrong message type: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_type_decodes_to_unknown() {
        let json = r#"{"type": "sensor_update", "sensor_id": 3}"#;
        let message: FeedMessage = serde_json::from_str(json).unwrap();
        assert_eq!(message, FeedMessage::Unknown);
    }

    #[test]
    fn test_missing_type_is_rejected() {
        let json = r#"{"waveform": {"samples": [], "values": []}}"#;
        assert!(serde_json::from_str::<FeedMessage>(json).is_err());
    }

    #[test]
    fn test_serialized_tag_matches_wire_name() {
        let message = FeedMessage::new_waveform(vec![0.0], vec![1.0]);
        let json = serde_json::to_string(&message).unwrap();
        assert!(json.contains("\"type\":\"waveform_update\""));
        assert_eq!(message.kind(), "waveform_update");
    }
}
