//! Analysis configuration.
//!
//! [`AnalysisConfig`] holds every tunable parameter of the latency analysis:
//! acquisition constants, the MEP window, the trial rejection thresholds and
//! one record per onset method.  All fields have defaults that match the
//! single-pulse TMS recordings the method comparison was built for
//! (5 kHz EMG, pulse at 1 s into each trial).
//!
//! The whole record can be read from JSON; missing fields fall back to the
//! defaults:
//!
//! ```
//! use mepl::AnalysisConfig;
//!
//! let cfg: AnalysisConfig = serde_json::from_str(r#"{ "fs": 2000.0 }"#).unwrap();
//! assert_eq!(cfg.fs, 2000.0);
//! assert_eq!(cfg.quality.corr_threshold, 0.3);
//! ```
use serde::{Deserialize, Serialize};

use crate::epoch::window_bounds;
use crate::error::Result;
use crate::onset::Method;

/// A window in seconds relative to the trigger, `[t_min, t_max)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub t_min: f64,
    pub t_max: f64,
}

impl TimeWindow {
    pub const fn new(t_min: f64, t_max: f64) -> Self {
        Self { t_min, t_max }
    }

    /// Sample bounds `[start, end)` of this window for a trigger at
    /// `trigger_time` seconds in a signal of `len` samples.
    /// See [`window_bounds`].
    pub fn samples(&self, fs: f64, trigger_time: f64, len: usize) -> Result<(usize, usize)> {
        window_bounds(fs, trigger_time, self.t_min, self.t_max, len)
    }

    /// Window length in seconds.
    pub fn duration(&self) -> f64 {
        self.t_max - self.t_min
    }
}

/// Top-level configuration for one analysis run.
///
/// Construct with struct-update syntax to change a few values:
///
/// ```
/// use mepl::{AnalysisConfig, TimeWindow};
///
/// let cfg = AnalysisConfig {
///     fs: 4000.0,
///     mep_window: TimeWindow::new(0.015, 0.06),
///     ..AnalysisConfig::default()
/// };
/// assert_eq!(cfg.trigger_time, 1.0);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// EMG sampling rate in Hz.
    ///
    /// Default: `5000.0`.
    pub fs: f64,

    /// Time of the stimulation pulse, in seconds from the start of each trial.
    /// Assumed identical across the trials of a subject.
    ///
    /// Default: `1.0` s.
    pub trigger_time: f64,

    /// Window searched for the MEP, relative to the trigger.
    ///
    /// Latencies are reported as sample offsets from the start of this window.
    ///
    /// Default: `+10 ms .. +50 ms`.
    pub mep_window: TimeWindow,

    /// Trial rejection thresholds.
    pub quality: QualityConfig,

    pub bigoni: DerivativeConfig,
    pub hamada1: PooledThresholdConfig,
    pub hamada2: TrialThresholdConfig,
    pub huang: SdMultipleConfig,
    pub daskalakis: LastCrossingConfig,
    pub garvey: McdConfig,

    /// Methods to run on every kept trial, in output order.
    ///
    /// Default: all of [`Method::ALL`].
    pub methods: Vec<Method>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            fs: 5000.0,
            trigger_time: 1.0,
            mep_window: TimeWindow::new(0.010, 0.050),
            quality: QualityConfig::default(),
            bigoni: DerivativeConfig::default(),
            hamada1: PooledThresholdConfig::default(),
            hamada2: TrialThresholdConfig::default(),
            huang: SdMultipleConfig::default(),
            daskalakis: LastCrossingConfig::default(),
            garvey: McdConfig::default(),
            methods: Method::ALL.to_vec(),
        }
    }
}

/// Thresholds of the trial quality filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    /// Pre-stimulus window inspected for background activity.
    ///
    /// Default: `-25 ms .. -5 ms`.
    pub baseline_window: TimeWindow,

    /// Trials whose Pearson correlation with the batch-mean MEP lies strictly
    /// below this are rejected; a trial exactly at the threshold is kept.
    ///
    /// Default: `0.3`.
    pub corr_threshold: f64,

    /// Trials whose peak-to-peak amplitude lies strictly below this
    /// percentile of the batch are rejected.
    ///
    /// Default: `25.0`.
    pub amplitude_percentile: f64,

    /// Percentile of the baseline power used as the base of the power limit.
    ///
    /// Default: `75.0`.
    pub power_percentile: f64,

    /// Multiple of the baseline power IQR added to the percentile.
    ///
    /// Default: `3.0`.
    pub power_iqr_factor: f64,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            baseline_window: TimeWindow::new(-0.025, -0.005),
            corr_threshold: 0.3,
            amplitude_percentile: 25.0,
            power_percentile: 75.0,
            power_iqr_factor: 3.0,
        }
    }
}

/// Derivative-chunk ("Bigoni") method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DerivativeConfig {
    /// Minimum number of consecutive positive first differences.
    ///
    /// Default: `4`.
    pub min_len: usize,
}

impl Default for DerivativeConfig {
    fn default() -> Self {
        Self { min_len: 4 }
    }
}

/// Threshold from a baseline pooled across all kept trials ("Hamada-1").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PooledThresholdConfig {
    /// Default: `-200 ms .. -20 ms`.
    pub window: TimeWindow,
    /// Threshold is `mean + sd_factor × std`.  Default: `2.0`.
    pub sd_factor: f64,
}

impl Default for PooledThresholdConfig {
    fn default() -> Self {
        Self { window: TimeWindow::new(-0.200, -0.020), sd_factor: 2.0 }
    }
}

/// Threshold from this trial's own baseline ("Hamada-2").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrialThresholdConfig {
    /// Default: `-100 ms .. -2 ms`.
    pub window: TimeWindow,
    /// Threshold is `mean + sd_factor × std`.  Default: `2.0`.
    pub sd_factor: f64,
}

impl Default for TrialThresholdConfig {
    fn default() -> Self {
        Self { window: TimeWindow::new(-0.100, -0.002), sd_factor: 2.0 }
    }
}

/// Standard-deviation multiple ("Huang").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SdMultipleConfig {
    /// Default: `-200 ms .. -2 ms`.
    pub window: TimeWindow,
    /// Threshold is `sd_factor × std(baseline)`.  Default: `5.0`.
    pub sd_factor: f64,
    /// Compare `|sample|` instead of the signed sample.
    ///
    /// The published description speaks of rectified EMG, but the analysis
    /// this crate reproduces compares the signed signal one-sidedly.
    ///
    /// Default: `false`.
    pub rectify: bool,
}

impl Default for SdMultipleConfig {
    fn default() -> Self {
        Self { window: TimeWindow::new(-0.200, -0.002), sd_factor: 5.0, rectify: false }
    }
}

/// Last crossing of the mean baseline level before the peak ("Daskalakis").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LastCrossingConfig {
    /// Default: `-40 ms .. -2 ms`.
    pub window: TimeWindow,
}

impl Default for LastCrossingConfig {
    fn default() -> Self {
        Self { window: TimeWindow::new(-0.040, -0.002) }
    }
}

/// Mean-consecutive-difference band ("Garvey").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct McdConfig {
    /// Default: `-100 ms .. -2 ms`.
    pub window: TimeWindow,
    /// Band half-width as a multiple of the MCD.  Default: `2.66`.
    pub mcd_factor: f64,
    /// Samples in a row that must leave the band.  Default: `2`.
    pub min_consecutive: usize,
}

impl Default for McdConfig {
    fn default() -> Self {
        Self { window: TimeWindow::new(-0.100, -0.002), mcd_factor: 2.66, min_consecutive: 2 }
    }
}
