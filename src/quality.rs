//! Trial quality filter.
//!
//! A trial is rejected when any of three criteria fires:
//!
//! * **amplitude** — its MEP peak-to-peak amplitude lies strictly below the
//!   25th percentile of the batch;
//! * **shape** — its Pearson correlation with the batch-mean MEP lies
//!   strictly below 0.3 (a trial exactly at 0.3 is kept; an undefined
//!   correlation, e.g. a flat trial, is rejected);
//! * **baseline** — fewer than half of its rectified pre-stimulus samples
//!   exceed `P75(|x|²) + 3·IQR(|x|²)` computed on that trial's baseline.
//!   An all-zero baseline gives a zero limit that no sample exceeds, so such
//!   a trial is rejected.
//!
//! All batch statistics are computed before any trial is judged.
use std::collections::BTreeSet;

use log::debug;
use ndarray::{Array1, ArrayView1, ArrayView2, Axis};

use crate::config::QualityConfig;
use crate::error::{MeplError, Result};
use crate::stats;

/// Outcome of [`evaluate_trials`] for one batch.
#[derive(Debug, Clone, PartialEq)]
pub struct QualityReport {
    pub n_trials: usize,
    /// Peak-to-peak amplitude of every trial's MEP window.
    pub peak_to_peak: Array1<f64>,
    /// Amplitude below which a trial is rejected.
    pub amplitude_threshold: f64,
    /// Correlation of every trial with the batch-mean MEP.
    pub correlation: Array1<f64>,
    pub rejected_amplitude: BTreeSet<usize>,
    pub rejected_correlation: BTreeSet<usize>,
    pub rejected_baseline: BTreeSet<usize>,
}

impl QualityReport {
    /// Union of the three rejection sets.
    pub fn rejected(&self) -> BTreeSet<usize> {
        self.rejected_amplitude
            .iter()
            .chain(&self.rejected_correlation)
            .chain(&self.rejected_baseline)
            .copied()
            .collect()
    }

    /// Kept trial indices, ascending.
    pub fn kept(&self) -> Vec<usize> {
        let rejected = self.rejected();
        (0..self.n_trials).filter(|i| !rejected.contains(i)).collect()
    }

    pub fn is_kept(&self, trial: usize) -> bool {
        trial < self.n_trials
            && !self.rejected_amplitude.contains(&trial)
            && !self.rejected_correlation.contains(&trial)
            && !self.rejected_baseline.contains(&trial)
    }
}

/// Per-trial `max − min` of a `[samples, trials]` matrix.
pub fn peak_to_peak_amplitude(epochs: ArrayView2<f64>) -> Array1<f64> {
    epochs.axis_iter(Axis(1)).map(stats::peak_to_peak).collect()
}

/// `true` when a correlation coefficient fails the shape criterion.
pub fn correlation_rejected(r: f64, threshold: f64) -> bool {
    r.is_nan() || r < threshold
}

/// Power limit `P(|x|², q) + k·IQR(|x|²)` of one baseline window.
pub fn baseline_power_limit(baseline: ArrayView1<f64>, cfg: &QualityConfig) -> f64 {
    let power = baseline.mapv(|v| v * v);
    stats::percentile(power.view(), cfg.power_percentile) + cfg.power_iqr_factor * stats::iqr(power.view())
}

/// `true` when fewer than half of the rectified samples exceed the power limit.
pub fn baseline_rejected(baseline: ArrayView1<f64>, cfg: &QualityConfig) -> bool {
    let limit = baseline_power_limit(baseline, cfg);
    let above = baseline.iter().filter(|v| v.abs() > limit).count();
    (above as f64) < baseline.len() as f64 / 2.0
}

/// Judge every trial of a batch.
///
/// `mep_epochs` and `baseline_epochs` are `[samples, trials]` windows cut
/// from the same trials in the same order.
pub fn evaluate_trials(
    mep_epochs: ArrayView2<f64>,
    baseline_epochs: ArrayView2<f64>,
    cfg: &QualityConfig,
) -> Result<QualityReport> {
    let n_trials = mep_epochs.ncols();
    if baseline_epochs.ncols() != n_trials {
        return Err(MeplError::ShapeMismatch {
            expected: vec![baseline_epochs.nrows(), n_trials],
            got: vec![baseline_epochs.nrows(), baseline_epochs.ncols()],
        });
    }
    if n_trials < 2 {
        return Err(MeplError::InsufficientTrials { got: n_trials, need: 2 });
    }

    // Batch statistics.
    let peak_to_peak = peak_to_peak_amplitude(mep_epochs);
    let amplitude_threshold = stats::percentile(peak_to_peak.view(), cfg.amplitude_percentile);
    let mean_mep = mep_epochs
        .mean_axis(Axis(1))
        .ok_or(MeplError::InsufficientTrials { got: n_trials, need: 2 })?;

    let correlation: Array1<f64> = mep_epochs
        .axis_iter(Axis(1))
        .map(|trial| stats::pearson(trial, mean_mep.view()))
        .collect();

    let rejected_amplitude: BTreeSet<usize> = peak_to_peak
        .iter()
        .enumerate()
        .filter(|&(_, &p)| p < amplitude_threshold)
        .map(|(i, _)| i)
        .collect();

    let rejected_correlation: BTreeSet<usize> = correlation
        .iter()
        .enumerate()
        .filter(|&(_, &r)| correlation_rejected(r, cfg.corr_threshold))
        .map(|(i, _)| i)
        .collect();

    let rejected_baseline: BTreeSet<usize> = baseline_epochs
        .axis_iter(Axis(1))
        .enumerate()
        .filter(|(_, b)| baseline_rejected(b.view(), cfg))
        .map(|(i, _)| i)
        .collect();

    for i in &rejected_amplitude {
        debug!("trial {i}: peak-to-peak {:.3e} < {amplitude_threshold:.3e}", peak_to_peak[*i]);
    }
    for i in &rejected_correlation {
        debug!("trial {i}: correlation {:.3} < {}", correlation[*i], cfg.corr_threshold);
    }
    for i in &rejected_baseline {
        debug!("trial {i}: noisy or empty baseline");
    }

    Ok(QualityReport {
        n_trials,
        peak_to_peak,
        amplitude_threshold,
        correlation,
        rejected_amplitude,
        rejected_correlation,
        rejected_baseline,
    })
}
