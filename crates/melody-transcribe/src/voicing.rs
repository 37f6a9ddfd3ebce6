//! Voice activity decoding.
//!
//! RMS energy is normalised and squashed into a per-frame voiced
//! probability, then a two-state HMM (silent = 0, voiced = 1) with sticky
//! self-transitions is decoded with Viterbi. Decoding the whole path keeps
//! sustained notes from chattering when vibrato dips the energy for a few
//! frames, which a per-frame threshold would not.

use serde::{Deserialize, Serialize};
use tracing::debug;

const VOICED: usize = 1;

/// Added to the energy deviation so flat input does not divide by zero.
const STD_EPSILON: f64 = 1e-9;

/// Parameters of the voiced/silent decoder.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VoicingParams {
    /// Energy level treated as the voiced/silent midpoint.
    pub silence_bias: f64,
    /// Self-transition probability of the silent state.
    pub silence_loop: f64,
    /// Self-transition probability of the voiced state.
    pub voiced_loop: f64,
}

impl Default for VoicingParams {
    fn default() -> Self {
        Self {
            silence_bias: 0.01,
            silence_loop: 0.5,
            voiced_loop: 0.6,
        }
    }
}

impl VoicingParams {
    /// Row-stochastic transition matrix, `[from][to]`.
    pub fn transition(&self) -> [[f64; 2]; 2] {
        [
            [self.silence_loop, 1.0 - self.silence_loop],
            [1.0 - self.voiced_loop, self.voiced_loop],
        ]
    }
}

/// Per-frame probability of being voiced.
///
/// `r = (rms - bias) / (std(rms) + ε)`, `p = sigmoid(r)`. The deviation is
/// the population standard deviation.
pub fn voiced_probability(rms: &[f64], silence_bias: f64) -> Vec<f64> {
    if rms.is_empty() {
        return Vec::new();
    }
    let n = rms.len() as f64;
    let mean = rms.iter().sum::<f64>() / n;
    let variance = rms.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
    let scale = variance.sqrt() + STD_EPSILON;

    rms.iter()
        .map(|x| sigmoid((x - silence_bias) / scale))
        .collect()
}

fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

fn safe_ln(p: f64) -> f64 {
    p.max(f64::MIN_POSITIVE).ln()
}

/// Most likely two-state path given per-frame state probabilities.
///
/// The initial distribution is uniform. Ties go to the lower state index.
pub fn viterbi(observations: &[[f64; 2]], transition: &[[f64; 2]; 2]) -> Vec<usize> {
    let num_frames = observations.len();
    if num_frames == 0 {
        return Vec::new();
    }

    let log_trans = transition.map(|row| row.map(safe_ln));
    let log_init = safe_ln(0.5);

    let mut previous = observations[0].map(|p| safe_ln(p) + log_init);
    let mut backtrack = vec![[0usize; 2]; num_frames];

    for (frame, obs) in observations.iter().enumerate().skip(1) {
        let mut current = [f64::NEG_INFINITY; 2];
        for state in 0..2 {
            let mut best_prev = 0;
            let mut best = previous[0] + log_trans[0][state];
            let candidate = previous[1] + log_trans[1][state];
            if candidate > best {
                best = candidate;
                best_prev = 1;
            }
            current[state] = best + safe_ln(obs[state]);
            backtrack[frame][state] = best_prev;
        }
        previous = current;
    }

    let mut state = if previous[1] > previous[0] { 1 } else { 0 };
    let mut path = vec![0usize; num_frames];
    for frame in (0..num_frames).rev() {
        path[frame] = state;
        state = backtrack[frame][state];
    }
    path
}

/// Decode a voiced (`true`) / silent (`false`) flag for every frame.
pub fn decode_voicing(rms: &[f64], params: &VoicingParams) -> Vec<bool> {
    let observations: Vec<[f64; 2]> = voiced_probability(rms, params.silence_bias)
        .into_iter()
        .map(|p| [1.0 - p, p])
        .collect();

    let states: Vec<bool> = viterbi(&observations, &params.transition())
        .into_iter()
        .map(|s| s == VOICED)
        .collect();

    debug!(
        frames = states.len(),
        voiced = states.iter().filter(|v| **v).count(),
        "decoded voice activity"
    );
    states
}
