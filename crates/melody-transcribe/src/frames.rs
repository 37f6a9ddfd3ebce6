use serde::{Deserialize, Serialize};

/// Per-frame analysis values produced by the upstream DSP layer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameFeatures {
    /// An attack was detected at this frame.
    #[serde(default)]
    pub onset: bool,
    /// RMS energy of the harmonic component.
    pub rms: f64,
    /// Frequency of the strongest pitch bin, 0.0 when none was found.
    pub pitch_hz: f64,
    /// Magnitude of the strongest pitch bin.
    #[serde(default)]
    pub magnitude: f64,
}

/// Everything the transcriber needs from one recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSet {
    /// File name of the raw recording these features came from.
    pub source_audio: String,
    /// Global tempo estimate.
    pub bpm: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_rate: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hop_length: Option<u32>,
    pub frames: Vec<FrameFeatures>,
}

impl FeatureSet {
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn rms(&self) -> Vec<f64> {
        self.frames.iter().map(|f| f.rms).collect()
    }

    pub fn pitch_hz(&self) -> Vec<f64> {
        self.frames.iter().map(|f| f.pitch_hz).collect()
    }

    /// Ascending frame indices of detected onsets.
    pub fn onset_frames(&self) -> Vec<usize> {
        self.frames
            .iter()
            .enumerate()
            .filter(|(_, f)| f.onset)
            .map(|(i, _)| i)
            .collect()
    }

    /// Length of one frame in seconds, when the DSP layer reported it.
    pub fn frame_seconds(&self) -> Option<f64> {
        match (self.sample_rate, self.hop_length) {
            (Some(sr), Some(hop)) if sr > 0 => Some(hop as f64 / sr as f64),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn onset_frames_are_ascending() {
        let json = r#"{
            "source_audio": "melody_0.wav",
            "bpm": 120.0,
            "frames": [
                {"onset": true, "rms": 0.1, "pitch_hz": 220.0},
                {"rms": 0.1, "pitch_hz": 220.0},
                {"onset": true, "rms": 0.2, "pitch_hz": 330.0, "magnitude": 4.0}
            ]
        }"#;
        let features: FeatureSet = serde_json::from_str(json).unwrap();
        assert_eq!(features.frame_count(), 3);
        assert_eq!(features.onset_frames(), vec![0, 2]);
        assert_eq!(features.frame_seconds(), None);
    }

    #[test]
    fn frame_seconds_from_hop() {
        let features = FeatureSet {
            source_audio: String::new(),
            bpm: 90.0,
            sample_rate: Some(22050),
            hop_length: Some(512),
            frames: Vec::new(),
        };
        let secs = features.frame_seconds().unwrap();
        assert!((secs - 512.0 / 22050.0).abs() < 1e-12);
    }
}
