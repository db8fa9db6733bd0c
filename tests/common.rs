//! Shared helpers: synthetic TMS/EMG recordings with known MEP onsets.
#![allow(dead_code)]

use mepl::{AnalysisConfig, SubjectRecording, TimeWindow};
use ndarray::{Array1, Array2};
use std::path::Path;

pub const FS: f64 = 5000.0;
pub const TRIGGER: f64 = 1.0;
pub const TRIAL_LEN: usize = 10_000;
/// MEP onset, in samples after the trigger (20 ms).
pub const ONSET_AFTER_TRIGGER: usize = 100;
/// Same onset as an index into the default +10..+50 ms MEP window.
pub const ONSET_IN_WINDOW: usize = 50;
/// Length of one MEP cycle (20 ms).
pub const MEP_LEN: usize = 100;

pub fn default_cfg() -> AnalysisConfig {
    AnalysisConfig {
        fs: FS,
        trigger_time: TRIGGER,
        mep_window: TimeWindow::new(0.010, 0.050),
        ..AnalysisConfig::default()
    }
}

/// Deterministic uniform noise in `[-amp, amp]` (xorshift64).
pub struct Noise(u64);

impl Noise {
    pub fn new(seed: u64) -> Self {
        Noise(seed.wrapping_mul(0x9E37_79B9_7F4A_7C15) | 1)
    }

    pub fn sample(&mut self, amp: f64) -> f64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        ((x >> 11) as f64 / (1u64 << 53) as f64 * 2.0 - 1.0) * amp
    }
}

/// One trial: noise everywhere except the MEP window, where the signal is a
/// clean single sine cycle of amplitude `mep_amp` starting at the onset.
/// `invert` puts the negative lobe first.
pub fn synthetic_trial(mep_amp: f64, noise_amp: f64, seed: u64, invert: bool) -> Array1<f64> {
    let trig = (TRIGGER * FS) as usize;
    let (win_start, win_end) = (trig + 50, trig + 250);
    let onset = trig + ONSET_AFTER_TRIGGER;
    let sign = if invert { -1.0 } else { 1.0 };
    let mut noise = Noise::new(seed);
    Array1::from_shape_fn(TRIAL_LEN, |t| {
        if (onset..onset + MEP_LEN).contains(&t) {
            let phase = (t - onset) as f64 / MEP_LEN as f64;
            sign * mep_amp * (2.0 * std::f64::consts::PI * phase).sin()
        } else if (win_start..win_end).contains(&t) {
            0.0
        } else {
            noise.sample(noise_amp)
        }
    })
}

/// `[samples, trials]` recording; trials listed in `small` get a tenth of
/// the MEP amplitude.
pub fn synthetic_recording(n_trials: usize, small: &[usize]) -> Array2<f64> {
    let mut emg = Array2::zeros((TRIAL_LEN, n_trials));
    for c in 0..n_trials {
        let amp = if small.contains(&c) { 0.1 } else { 1.0 };
        emg.column_mut(c).assign(&synthetic_trial(amp, 0.01, c as u64 + 1, false));
    }
    emg
}

/// Write `emg` as `<dir>/<subject_id>/emg.safetensors`.
pub fn write_subject(dir: &Path, subject_id: &str, emg: &Array2<f64>, fs: Option<f64>) {
    let sub = dir.join(subject_id);
    std::fs::create_dir_all(&sub).unwrap();
    let rec = SubjectRecording { subject_id: subject_id.to_string(), emg: emg.clone(), fs };
    rec.save(&sub.join(mepl::io::SUBJECT_FILE)).unwrap();
}
