//! Baseline-threshold onsets.
//!
//! | method   | baseline                         | level                      | test            |
//! |----------|----------------------------------|----------------------------|-----------------|
//! | Hamada-1 | pooled over all kept trials      | `mean + 2·std`             | `|v| > level`   |
//! | Hamada-2 | this trial, −100 ms .. −2 ms     | `mean + 2·std`             | `|v| > level`   |
//! | Huang    | this trial, −200 ms .. −2 ms     | `5·std`                    | `v > level`     |
//! | Garvey   | this trial, −100 ms .. −2 ms, \|·\| | `mean ± 2.66·MCD`        | outside the band for `k` samples |
//!
//! The onset is the first MEP-window sample that passes the test.
use ndarray::Array1;

use crate::config::{McdConfig, PooledThresholdConfig, SdMultipleConfig, TrialThresholdConfig};
use crate::epoch::Epoch;
use crate::error::Result;
use crate::stats;

use super::{first_where, trial_baseline, Latency, Method};

/// Mean and standard deviation of a baseline pooled across trials.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PooledBaseline {
    pub mean: f64,
    pub std: f64,
}

impl PooledBaseline {
    /// Population statistics over every sample yielded by `samples`.
    /// An empty pool gives a zero level.
    pub fn from_samples(samples: impl IntoIterator<Item = f64>) -> Self {
        let values = Array1::from_iter(samples);
        if values.is_empty() {
            return Self { mean: 0.0, std: 0.0 };
        }
        Self { mean: stats::mean(values.view()), std: stats::std(values.view()) }
    }

    pub fn threshold(&self, sd_factor: f64) -> f64 {
        self.mean + sd_factor * self.std
    }
}

/// First sample whose magnitude exceeds the pooled `mean + k·std`.
pub fn latency_hamada1(epoch: &Epoch, pooled: &PooledBaseline, cfg: &PooledThresholdConfig) -> Latency {
    let level = pooled.threshold(cfg.sd_factor);
    first_where(epoch.samples(), |v| v.abs() > level)
}

/// First sample whose magnitude exceeds this trial's `mean + k·std`.
pub fn latency_hamada2(epoch: &Epoch, cfg: &TrialThresholdConfig) -> Result<Latency> {
    let base = trial_baseline(epoch, &cfg.window, Method::Hamada2)?;
    let level = stats::mean(base) + cfg.sd_factor * stats::std(base);
    Ok(first_where(epoch.samples(), |v| v.abs() > level))
}

/// First sample above `k·std` of this trial's baseline.
///
/// The comparison is one-sided on the signed signal unless `cfg.rectify`.
pub fn latency_huang(epoch: &Epoch, cfg: &SdMultipleConfig) -> Result<Latency> {
    let base = trial_baseline(epoch, &cfg.window, Method::Huang)?;
    let level = cfg.sd_factor * stats::std(base);
    Ok(if cfg.rectify {
        first_where(epoch.samples(), |v| v.abs() > level)
    } else {
        first_where(epoch.samples(), |v| v > level)
    })
}

/// Start of the first `min_consecutive` samples strictly outside
/// `mean ± k·MCD` of the rectified baseline.
pub fn latency_garvey(epoch: &Epoch, cfg: &McdConfig) -> Result<Latency> {
    let base = trial_baseline(epoch, &cfg.window, Method::Garvey)?.mapv(f64::abs);
    let centre = stats::mean(base.view());
    let half_width = cfg.mcd_factor * stats::mean_consecutive_difference(base.view());
    let (lower, upper) = (centre - half_width, centre + half_width);

    let need = cfg.min_consecutive.max(1);
    let mut streak = 0usize;
    for (i, &v) in epoch.samples().iter().enumerate() {
        if v < lower || v > upper {
            streak += 1;
            if streak == need {
                return Ok(Latency::Onset(i + 1 - need));
            }
        } else {
            streak = 0;
        }
    }
    Ok(Latency::NotFound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TimeWindow;
    use crate::error::MeplError;

    const FS: f64 = 1000.0;

    /// 1 s of pre-stimulus trace from `pre`, then the MEP window starting at
    /// the trigger.
    fn trial(pre: impl Fn(usize) -> f64, mep: &[f64]) -> Epoch {
        let mut v: Vec<f64> = (0..1000).map(pre).collect();
        v.extend_from_slice(mep);
        let trace = Array1::from(v);
        Epoch::from_trial(trace.view(), FS, 1.0, &TimeWindow::new(0.0, mep.len() as f64 / FS)).unwrap()
    }

    #[test]
    fn pooled_statistics() {
        let p = PooledBaseline::from_samples([1.0, -1.0, 1.0, -1.0]);
        assert_eq!(p.mean, 0.0);
        assert_eq!(p.std, 1.0);
        assert_eq!(p.threshold(2.0), 2.0);
    }

    #[test]
    fn hamada1_zero_baseline_finds_single_spike() {
        let mut mep = vec![0.0; 40];
        mep[12] = -0.5;
        let ep = Epoch::new(Array1::from(mep), FS, 1.0).unwrap();
        let pooled = PooledBaseline::from_samples(vec![0.0; 100]);
        assert_eq!(latency_hamada1(&ep, &pooled, &PooledThresholdConfig::default()), Latency::Onset(12));
    }

    #[test]
    fn hamada1_nothing_above_level() {
        let ep = Epoch::new(Array1::from(vec![0.5; 10]), FS, 1.0).unwrap();
        let pooled = PooledBaseline { mean: 0.0, std: 1.0 };
        assert_eq!(latency_hamada1(&ep, &pooled, &PooledThresholdConfig::default()), Latency::NotFound);
    }

    #[test]
    fn hamada2_uses_own_baseline() {
        let alt = |i: usize| if i % 2 == 0 { 1.0 } else { -1.0 };
        // level = 0 + 2·1 = 2
        let ep = trial(alt, &[0.0, 1.5, -2.0, -2.5, 3.0]);
        assert_eq!(latency_hamada2(&ep, &TrialThresholdConfig::default()).unwrap(), Latency::Onset(3));
    }

    #[test]
    fn hamada2_nothing_above_level() {
        let alt = |i: usize| if i % 2 == 0 { 1.0 } else { -1.0 };
        // level 2; the largest magnitude is 1.9
        let ep = trial(alt, &[0.5, -0.5, 1.5, -1.9, 0.0]);
        assert_eq!(latency_hamada2(&ep, &TrialThresholdConfig::default()).unwrap(), Latency::NotFound);
    }

    #[test]
    fn huang_is_one_sided_unless_rectified() {
        let alt = |i: usize| if i % 2 == 0 { 0.1 } else { -0.1 };
        // level = 5 · 0.1 = 0.5
        let mep = [0.0, -0.8, 0.2, 0.7];
        let ep = trial(alt, &mep);
        assert_eq!(latency_huang(&ep, &SdMultipleConfig::default()).unwrap(), Latency::Onset(3));
        let rect = SdMultipleConfig { rectify: true, ..SdMultipleConfig::default() };
        assert_eq!(latency_huang(&ep, &rect).unwrap(), Latency::Onset(1));
    }

    #[test]
    fn huang_nothing_above_level() {
        let alt = |i: usize| if i % 2 == 0 { 1.0 } else { -1.0 };
        // level 5, signed or rectified
        let ep = trial(alt, &[0.5, -0.5, 1.5, -4.9, 4.9, 0.0]);
        assert_eq!(latency_huang(&ep, &SdMultipleConfig::default()).unwrap(), Latency::NotFound);
        let rect = SdMultipleConfig { rectify: true, ..SdMultipleConfig::default() };
        assert_eq!(latency_huang(&ep, &rect).unwrap(), Latency::NotFound);
    }

    #[test]
    fn per_trial_methods_need_a_source() {
        let ep = Epoch::new(Array1::from(vec![1.0; 10]), FS, 1.0).unwrap();
        assert_eq!(
            latency_huang(&ep, &SdMultipleConfig::default()),
            Err(MeplError::MissingBaseline { method: "huang" })
        );
    }

    #[test]
    fn baseline_outside_trace_is_invalid_window() {
        let trace = Array1::from(vec![0.0; 1100]);
        // trigger 50 ms into the trace: the 100 ms baseline starts before sample 0
        let ep = Epoch::from_trial(trace.view(), FS, 0.05, &TimeWindow::new(0.0, 0.02)).unwrap();
        assert!(matches!(
            latency_hamada2(&ep, &TrialThresholdConfig::default()),
            Err(MeplError::InvalidWindow { .. })
        ));
    }

    #[test]
    fn garvey_needs_consecutive_excursion() {
        let alt = |i: usize| if i % 2 == 0 { 1.0 } else { -1.0 };
        // rectified baseline is all ones: mean 1, MCD 0, the band collapses to 1
        let cfg = McdConfig { min_consecutive: 3, ..McdConfig::default() };
        let ep = trial(alt, &[1.0, 5.0, 1.0, 5.0, 6.0, 7.0, 1.0]);
        assert_eq!(latency_garvey(&ep, &cfg).unwrap(), Latency::Onset(3));
    }

    #[test]
    fn garvey_band_from_mcd() {
        // rectified baseline alternates 0 and 1: mean 0.5, MCD 1, band 0.5 ± 2.66
        let ramp = |i: usize| (i % 2) as f64;
        let ep = trial(ramp, &[0.0, 3.0, -2.0, 3.5, 3.6, 0.0]);
        assert_eq!(latency_garvey(&ep, &McdConfig::default()).unwrap(), Latency::Onset(3));
    }

    #[test]
    fn garvey_flat_mep_stays_in_band() {
        // band 0.5 ± 2.66
        let ramp = |i: usize| (i % 2) as f64;
        let ep = trial(ramp, &[0.5; 20]);
        assert_eq!(latency_garvey(&ep, &McdConfig::default()).unwrap(), Latency::NotFound);
    }

    #[test]
    fn garvey_isolated_excursions_are_not_onsets() {
        let ramp = |i: usize| (i % 2) as f64;
        let ep = trial(ramp, &[0.5, 4.0, 0.5, -3.0, 0.5, 4.0]);
        assert_eq!(latency_garvey(&ep, &McdConfig::default()).unwrap(), Latency::NotFound);
    }
}
