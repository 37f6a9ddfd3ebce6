use crate::{Error, Result};

/// Beats per analysis frame, `k = duration * bpm / (frames * 60)`.
///
/// Scaling by `k` stretches the recording to `target_duration_secs` at
/// `bpm`, so `k * frames` is a length in beats at that tempo.
pub fn beat_scale(target_duration_secs: f64, bpm: f64, total_frames: usize) -> Result<f64> {
    if total_frames == 0 {
        return Err(Error::DegenerateSegmentation);
    }
    if !bpm.is_finite() || bpm <= 0.0 {
        return Err(Error::InvalidTempo { bpm });
    }
    Ok(target_duration_secs * bpm / (total_frames as f64 * 60.0))
}

/// Per-segment durations in beats.
pub fn durations(lengths: &[usize], target_duration_secs: f64, bpm: f64) -> Result<Vec<f64>> {
    let k = beat_scale(target_duration_secs, bpm, lengths.iter().sum())?;
    Ok(lengths.iter().map(|&l| k * l as f64).collect())
}
