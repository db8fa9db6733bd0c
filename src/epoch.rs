//! Trigger-relative epoching.
//!
//! A recording of one subject is a `[samples, trials]` matrix: every column is
//! one trial, every trial has the stimulation pulse at the same
//! `trigger_time`.  A window `[t_min, t_max)` relative to the pulse maps to
//! the sample range
//!
//! ```text
//! start = round((trigger_time + t_min) · fs)
//! end   = round((trigger_time + t_max) · fs)
//! ```
//!
//! Windows that are empty, reversed or not fully contained in the signal are
//! rejected with [`MeplError::InvalidWindow`]; nothing is silently truncated.
use ndarray::{s, Array1, ArrayView1, ArrayView2, Array2};

use crate::config::TimeWindow;
use crate::error::{MeplError, Result};
use crate::stats;

/// Sample bounds `[start, end)` of a trigger-relative window in a signal of
/// `len` samples.
pub fn window_bounds(
    fs: f64,
    trigger_time: f64,
    t_min: f64,
    t_max: f64,
    len: usize,
) -> Result<(usize, usize)> {
    check_fs(fs)?;
    let start = ((trigger_time + t_min) * fs).round() as i64;
    let end = ((trigger_time + t_max) * fs).round() as i64;
    if start < 0 || start >= end || end > len as i64 {
        return Err(MeplError::InvalidWindow { start, end, len });
    }
    Ok((start as usize, end as usize))
}

/// Cut `[t_min, t_max)` around the trigger out of every trial of `data`
/// (`[samples, trials]`).  Returns `[end − start, trials]`.
pub fn segment(
    data: ArrayView2<f64>,
    fs: f64,
    trigger_time: f64,
    t_min: f64,
    t_max: f64,
) -> Result<Array2<f64>> {
    let (start, end) = window_bounds(fs, trigger_time, t_min, t_max, data.nrows())?;
    Ok(data.slice(s![start..end, ..]).to_owned())
}

/// Single-trial variant of [`segment`], returning a view into `signal`.
pub fn segment_1d<'a>(
    signal: ArrayView1<'a, f64>,
    fs: f64,
    trigger_time: f64,
    t_min: f64,
    t_max: f64,
) -> Result<ArrayView1<'a, f64>> {
    let (start, end) = window_bounds(fs, trigger_time, t_min, t_max, signal.len())?;
    Ok(signal.slice_move(s![start..end]))
}

fn check_fs(fs: f64) -> Result<()> {
    if fs.is_finite() && fs > 0.0 {
        Ok(())
    } else {
        Err(MeplError::InvalidEpoch("sampling rate must be positive and finite"))
    }
}

/// One trial's MEP window, plus the full trial trace its baselines are cut from.
///
/// The stored samples are never modified after construction; detectors that
/// need a sign-flipped signal work on a local copy.
#[derive(Debug, Clone, PartialEq)]
pub struct Epoch {
    samples: Array1<f64>,
    fs: f64,
    trigger_time: f64,
    source: Option<Array1<f64>>,
}

impl Epoch {
    /// Wrap an already-extracted MEP window.
    ///
    /// `trigger_time` is the pulse time in seconds from the start of the
    /// trial trace attached with [`Epoch::with_source`].
    pub fn new(samples: Array1<f64>, fs: f64, trigger_time: f64) -> Result<Self> {
        check_fs(fs)?;
        if samples.is_empty() {
            return Err(MeplError::InvalidEpoch("epoch has no samples"));
        }
        Ok(Self { samples, fs, trigger_time, source: None })
    }

    /// Cut `mep_window` out of a full trial trace and keep the trace as the
    /// baseline source.
    pub fn from_trial(
        trial: ArrayView1<f64>,
        fs: f64,
        trigger_time: f64,
        mep_window: &TimeWindow,
    ) -> Result<Self> {
        let mep = segment_1d(trial, fs, trigger_time, mep_window.t_min, mep_window.t_max)?;
        Ok(Self::new(mep.to_owned(), fs, trigger_time)?.with_source(trial.to_owned()))
    }

    /// Attach the trial trace that per-trial baseline windows are cut from.
    pub fn with_source(mut self, source: Array1<f64>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn samples(&self) -> ArrayView1<'_, f64> {
        self.samples.view()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn fs(&self) -> f64 {
        self.fs
    }

    pub fn trigger_time(&self) -> f64 {
        self.trigger_time
    }

    /// Sample index of the pulse within the source trace.
    pub fn trigger_sample(&self) -> usize {
        (self.trigger_time * self.fs).round().max(0.0) as usize
    }

    pub fn source(&self) -> Option<ArrayView1<'_, f64>> {
        self.source.as_ref().map(|s| s.view())
    }

    /// `|max − min|` of the MEP window.
    pub fn peak_to_peak(&self) -> f64 {
        stats::peak_to_peak(self.samples.view()).abs()
    }

    /// Baseline window of this trial, or `None` without a source trace.
    pub fn baseline(&self, window: &TimeWindow) -> Option<Result<ArrayView1<'_, f64>>> {
        self.source().map(|src| {
            segment_1d(src, self.fs, self.trigger_time, window.t_min, window.t_max)
        })
    }
}
