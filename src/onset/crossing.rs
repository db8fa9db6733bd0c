//! Last-crossing-before-peak onset ("Daskalakis").
//!
//! The onset is the last sample before the point of maximum deflection that
//! still lies above the mean pre-stimulus level.  Orientation is handled as
//! in [`derivative`](super::derivative); the level itself is taken from the
//! untouched baseline.
use crate::config::LastCrossingConfig;
use crate::epoch::Epoch;
use crate::error::Result;
use crate::stats;

use super::{oriented, trial_baseline, Latency, Method};

pub fn latency_daskalakis(epoch: &Epoch, cfg: &LastCrossingConfig) -> Result<Latency> {
    let base = trial_baseline(epoch, &cfg.window, Method::Daskalakis)?;
    let level = stats::mean(base);
    let (v, p_peak) = oriented(epoch.samples());
    Ok((0..p_peak).rev().find(|&i| v[i] > level).into())
}
