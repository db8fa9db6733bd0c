//! Derivative-chunk onset ("Bigoni").
//!
//! The onset is where the signal starts its longest uninterrupted rise
//! towards the main peak:
//!
//! 1. Orient the epoch so its first large deflection is positive.
//! 2. Take the first difference of the samples before the positive peak.
//! 3. Split the indices with a strictly positive difference into runs of
//!    consecutive indices.
//! 4. Pick the longest run of at least `min_len`; on a tie the earliest run
//!    wins.  Its first index is the onset.
use crate::config::DerivativeConfig;
use crate::epoch::Epoch;

use super::{oriented, Latency};

pub fn latency_bigoni(epoch: &Epoch, cfg: &DerivativeConfig) -> Latency {
    let (v, p_peak) = oriented(epoch.samples());

    // (start, len) of the best run so far.
    let mut best: Option<(usize, usize)> = None;
    let mut run: Option<(usize, usize)> = None;

    // diff[i] = v[i + 1] - v[i] for i + 1 < p_peak
    for i in 0..p_peak.saturating_sub(1) {
        if v[i + 1] - v[i] > 0.0 {
            run = Some(match run {
                Some((start, len)) => (start, len + 1),
                None => (i, 1),
            });
        } else if let Some(r) = run.take() {
            best = longer(best, r, cfg.min_len);
        }
    }
    if let Some(r) = run {
        best = longer(best, r, cfg.min_len);
    }

    best.map(|(start, _)| start).into()
}

fn longer(best: Option<(usize, usize)>, run: (usize, usize), min_len: usize) -> Option<(usize, usize)> {
    if run.1 < min_len {
        return best;
    }
    match best {
        Some(b) if b.1 >= run.1 => Some(b),
        _ => Some(run),
    }
}
