//! Descriptive statistics on 1-D signals.
//!
//! Conventions match NumPy so thresholds agree with the reference analysis:
//!   * `std` is the population standard deviation (`ddof = 0`),
//!   * `percentile` uses linear interpolation between closest ranks,
//!   * `argmax` / `argmin` return the **first** occurrence.
//!
//! Accumulation is done in `f64`.  Callers guarantee non-empty input; an
//! empty slice yields `NaN` for the moment statistics.
use ndarray::ArrayView1;

/// Arithmetic mean.
pub fn mean(x: ArrayView1<f64>) -> f64 {
    x.sum() / x.len() as f64
}

/// Population standard deviation (`ddof = 0`).
pub fn std(x: ArrayView1<f64>) -> f64 {
    let m = mean(x);
    let var = x.iter().map(|&v| (v - m).powi(2)).sum::<f64>() / x.len() as f64;
    var.sqrt()
}

/// `q`-th percentile (`0 ≤ q ≤ 100`), linear interpolation.
///
/// Matches `numpy.percentile(x, q)` with the default `method='linear'`.
pub fn percentile(x: ArrayView1<f64>, q: f64) -> f64 {
    let mut sorted: Vec<f64> = x.to_vec();
    if sorted.is_empty() {
        return f64::NAN;
    }
    sorted.sort_by(f64::total_cmp);
    percentile_sorted(&sorted, q)
}

fn percentile_sorted(sorted: &[f64], q: f64) -> f64 {
    let pos = (q / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// Interquartile range `P75 − P25`, as `scipy.stats.iqr`.
pub fn iqr(x: ArrayView1<f64>) -> f64 {
    let mut sorted: Vec<f64> = x.to_vec();
    if sorted.is_empty() {
        return f64::NAN;
    }
    sorted.sort_by(f64::total_cmp);
    percentile_sorted(&sorted, 75.0) - percentile_sorted(&sorted, 25.0)
}

/// Pearson correlation coefficient.
///
/// Returns `NaN` when either input has zero variance (the coefficient is
/// undefined), so any `r > threshold` test on it is false.
pub fn pearson(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    let (ma, mb) = (mean(a), mean(b));
    let mut sab = 0.0;
    let mut saa = 0.0;
    let mut sbb = 0.0;
    for (&x, &y) in a.iter().zip(b.iter()) {
        let (dx, dy) = (x - ma, y - mb);
        sab += dx * dy;
        saa += dx * dx;
        sbb += dy * dy;
    }
    if saa == 0.0 || sbb == 0.0 {
        return f64::NAN;
    }
    sab / (saa * sbb).sqrt()
}

/// `max − min`.  Zero for a constant signal.
pub fn peak_to_peak(x: ArrayView1<f64>) -> f64 {
    let (lo, hi) = x.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
        (lo.min(v), hi.max(v))
    });
    hi - lo
}

/// Index of the first maximum.
pub fn argmax(x: ArrayView1<f64>) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &v) in x.iter().enumerate() {
        match best {
            Some((_, b)) if v <= b => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}

/// Index of the first minimum.
pub fn argmin(x: ArrayView1<f64>) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &v) in x.iter().enumerate() {
        match best {
            Some((_, b)) if v >= b => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}

/// Mean absolute first difference, `mean(|x[i+1] − x[i]|)`.
pub fn mean_consecutive_difference(x: ArrayView1<f64>) -> f64 {
    if x.len() < 2 {
        return 0.0;
    }
    let total: f64 = x.windows(2).into_iter().map(|w| (w[1] - w[0]).abs()).sum();
    total / (x.len() - 1) as f64
}
