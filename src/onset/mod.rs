//! MEP onset detection.
//!
//! Every method takes one [`Epoch`] and returns a [`Latency`]: the sample
//! offset of the onset from the start of the MEP window, or
//! [`Latency::NotFound`] when the method's criterion is never met.  Not
//! finding an onset is an ordinary outcome and never an `Err`; errors are
//! reserved for configuration faults such as a baseline window that does not
//! fit in the trial.
//!
//! - [`derivative`]: longest run of rising samples before the peak ("Bigoni").
//! - [`threshold`]: first sample above a baseline-derived level
//!   ("Hamada-1", "Hamada-2", "Huang") and the MCD band ("Garvey").
//! - [`crossing`]: last crossing of the mean baseline level before the peak
//!   ("Daskalakis").
//!
//! [`Detector`] binds a configuration and the subject's pooled baseline so
//! that any method can be selected at run time through [`Method`].
use std::fmt;

use log::debug;
use ndarray::{ArrayView1, ArrayView2, CowArray, Ix1};
use serde::{Deserialize, Serialize};

use crate::config::{AnalysisConfig, TimeWindow};
use crate::epoch::Epoch;
use crate::error::{MeplError, Result};
use crate::stats;

pub mod crossing;
pub mod derivative;
pub mod threshold;

pub use crossing::latency_daskalakis;
pub use derivative::latency_bigoni;
pub use threshold::{latency_garvey, latency_hamada1, latency_hamada2, latency_huang, PooledBaseline};

/// Onset estimate for one (epoch, method) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Latency {
    /// Sample offset from the start of the MEP window.
    Onset(usize),
    NotFound,
}

impl Latency {
    pub fn index(self) -> Option<usize> {
        match self {
            Latency::Onset(i) => Some(i),
            Latency::NotFound => None,
        }
    }

    pub fn is_found(self) -> bool {
        matches!(self, Latency::Onset(_))
    }

    /// Latency in milliseconds at sampling rate `fs`.
    pub fn to_ms(self, fs: f64) -> Option<f64> {
        self.index().map(|i| i as f64 * 1000.0 / fs)
    }
}

impl From<Option<usize>> for Latency {
    fn from(idx: Option<usize>) -> Self {
        idx.map_or(Latency::NotFound, Latency::Onset)
    }
}

impl fmt::Display for Latency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Latency::Onset(i) => write!(f, "{i}"),
            Latency::NotFound => f.write_str("not_found"),
        }
    }
}

/// Selectable onset method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    Bigoni,
    Hamada1,
    Hamada2,
    Huang,
    Daskalakis,
    Garvey,
}

impl Method {
    pub const ALL: [Method; 6] = [
        Method::Bigoni,
        Method::Hamada1,
        Method::Hamada2,
        Method::Huang,
        Method::Daskalakis,
        Method::Garvey,
    ];

    /// Column name used in result tables.
    pub fn name(self) -> &'static str {
        match self {
            Method::Bigoni => "bigoni",
            Method::Hamada1 => "hamada1",
            Method::Hamada2 => "hamada2",
            Method::Huang => "huang",
            Method::Daskalakis => "daskalakis",
            Method::Garvey => "garvey",
        }
    }

    pub fn from_name(name: &str) -> Option<Method> {
        Method::ALL.into_iter().find(|m| m.name() == name)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Runs any [`Method`] under one [`AnalysisConfig`].
///
/// The pooled baseline needed by [`Method::Hamada1`] is a batch statistic:
/// attach it with [`Detector::with_pooled_baseline`] once all kept trials are
/// known, before detecting on any of them.
#[derive(Debug, Clone)]
pub struct Detector<'c> {
    cfg: &'c AnalysisConfig,
    pooled: Option<PooledBaseline>,
}

impl<'c> Detector<'c> {
    pub fn new(cfg: &'c AnalysisConfig) -> Self {
        Self { cfg, pooled: None }
    }

    /// Pool every sample of `windows` (`[samples, trials]`).
    pub fn with_pooled_baseline(mut self, windows: ArrayView2<f64>) -> Self {
        self.pooled = Some(PooledBaseline::from_samples(windows.iter().copied()));
        self
    }

    pub fn pooled_baseline(&self) -> Option<&PooledBaseline> {
        self.pooled.as_ref()
    }

    pub fn detect(&self, epoch: &Epoch, method: Method) -> Result<Latency> {
        let cfg = self.cfg;
        let latency = match method {
            Method::Bigoni => latency_bigoni(epoch, &cfg.bigoni),
            Method::Hamada1 => {
                let pooled = self
                    .pooled
                    .as_ref()
                    .ok_or(MeplError::MissingBaseline { method: method.name() })?;
                latency_hamada1(epoch, pooled, &cfg.hamada1)
            }
            Method::Hamada2 => latency_hamada2(epoch, &cfg.hamada2)?,
            Method::Huang => latency_huang(epoch, &cfg.huang)?,
            Method::Daskalakis => latency_daskalakis(epoch, &cfg.daskalakis)?,
            Method::Garvey => latency_garvey(epoch, &cfg.garvey)?,
        };
        if !latency.is_found() {
            debug!("{method}: no onset found");
        }
        Ok(latency)
    }

    /// Run every configured method on `epoch`, in configuration order.
    pub fn detect_all(&self, epoch: &Epoch) -> Vec<(Method, Result<Latency>)> {
        self.cfg
            .methods
            .iter()
            .map(|&m| (m, self.detect(epoch, m)))
            .collect()
    }
}

/// The epoch with its main deflection made positive, and the index of that
/// peak.
///
/// When the minimum comes before the maximum the signal is negated.  The
/// negated samples live only in the returned copy; the epoch is untouched.
pub(crate) fn oriented(x: ArrayView1<'_, f64>) -> (CowArray<'_, f64, Ix1>, usize) {
    let p_peak = stats::argmax(x).unwrap_or(0);
    let n_peak = stats::argmin(x).unwrap_or(0);
    if n_peak < p_peak {
        let flipped = x.mapv(|v| -v);
        let p_peak = stats::argmax(flipped.view()).unwrap_or(0);
        (CowArray::from(flipped), p_peak)
    } else {
        (CowArray::from(x), p_peak)
    }
}

/// This trial's baseline window for `method`.
pub(crate) fn trial_baseline<'e>(
    epoch: &'e Epoch,
    window: &TimeWindow,
    method: Method,
) -> Result<ArrayView1<'e, f64>> {
    epoch
        .baseline(window)
        .ok_or(MeplError::MissingBaseline { method: method.name() })?
}

/// Index of the first sample satisfying `pred`.
pub(crate) fn first_where(x: ArrayView1<f64>, pred: impl Fn(f64) -> bool) -> Latency {
    x.iter().position(|&v| pred(v)).into()
}
