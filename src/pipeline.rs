//! Subject and dataset drivers.
//!
//! For one subject the steps run in this order:
//!
//! ```text
//! emg [samples, trials]
//!   ├─ segment MEP window and quality baseline window
//!   ├─ evaluate_trials          batch statistics, then reject/keep
//!   ├─ pooled Hamada-1 baseline over the kept trials
//!   └─ for every kept trial, for every configured method
//!        Detector::detect  →  LatencyRecord  →  RecordSink
//! ```
//!
//! Records are streamed to the sink as they are produced.  `trial_index` is
//! always the trial's position in the original recording, so rows join
//! directly with annotation tables keyed the same way.
use anyhow::Result;
use log::{info, warn};
use ndarray::{Array1, Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use crate::config::AnalysisConfig;
use crate::epoch::{segment, window_bounds, Epoch};
use crate::error::MeplError;
use crate::onset::{Detector, Latency, Method};
use crate::quality::{evaluate_trials, QualityReport};

/// One row of the result table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatencyRecord {
    pub subject_id: String,
    pub trial_index: usize,
    pub method: Method,
    pub latency: Latency,
}

/// Destination for result rows.
pub trait RecordSink {
    fn emit(&mut self, record: LatencyRecord) -> std::io::Result<()>;
}

impl RecordSink for Vec<LatencyRecord> {
    fn emit(&mut self, record: LatencyRecord) -> std::io::Result<()> {
        self.push(record);
        Ok(())
    }
}

/// A subject's continuous trials, as handed over by a loader.
#[derive(Debug, Clone)]
pub struct SubjectRecording {
    pub subject_id: String,
    /// `[samples, trials]`.
    pub emg: Array2<f64>,
    /// Sampling rate stored with the recording, if any.
    pub fs: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SubjectSummary {
    pub subject_id: String,
    pub n_trials: usize,
    pub n_kept: usize,
    pub n_records: usize,
    pub n_not_found: usize,
    /// (trial, method) pairs dropped because detection failed.
    pub n_failed: usize,
}

/// Check every window the configuration will cut against a trial length.
pub fn validate_windows(cfg: &AnalysisConfig, n_samples: usize) -> std::result::Result<(), MeplError> {
    let mut windows = vec![cfg.mep_window, cfg.quality.baseline_window];
    for m in &cfg.methods {
        windows.push(match m {
            Method::Bigoni => continue,
            Method::Hamada1 => cfg.hamada1.window,
            Method::Hamada2 => cfg.hamada2.window,
            Method::Huang => cfg.huang.window,
            Method::Daskalakis => cfg.daskalakis.window,
            Method::Garvey => cfg.garvey.window,
        });
    }
    for w in windows {
        window_bounds(cfg.fs, cfg.trigger_time, w.t_min, w.t_max, n_samples)?;
    }
    Ok(())
}

/// Segment both quality windows and judge every trial.
pub fn screen_trials(emg: ArrayView2<f64>, cfg: &AnalysisConfig) -> std::result::Result<QualityReport, MeplError> {
    let (fs, trig) = (cfg.fs, cfg.trigger_time);
    let mep = segment(emg, fs, trig, cfg.mep_window.t_min, cfg.mep_window.t_max)?;
    let qb = &cfg.quality.baseline_window;
    let baseline = segment(emg, fs, trig, qb.t_min, qb.t_max)?;
    evaluate_trials(mep.view(), baseline.view(), &cfg.quality)
}

/// Kept MEP windows with their original trial indices.
pub fn kept_epochs(
    emg: ArrayView2<f64>,
    cfg: &AnalysisConfig,
) -> std::result::Result<Vec<(usize, Array1<f64>)>, MeplError> {
    validate_windows(cfg, emg.nrows())?;
    let report = screen_trials(emg, cfg)?;
    report
        .kept()
        .into_iter()
        .map(|trial| {
            let ep = Epoch::from_trial(emg.column(trial), cfg.fs, cfg.trigger_time, &cfg.mep_window)?;
            Ok((trial, ep.samples().to_owned()))
        })
        .collect()
}

/// Run the full analysis on one subject, streaming rows into `sink`.
///
/// Configuration and data faults come back as a [`MeplError`] inside the
/// `anyhow::Error`; sink failures come back as I/O errors.
pub fn process_subject<S: RecordSink + ?Sized>(
    subject_id: &str,
    emg: ArrayView2<f64>,
    cfg: &AnalysisConfig,
    sink: &mut S,
) -> Result<SubjectSummary> {
    let (n_samples, n_trials) = emg.dim();
    validate_windows(cfg, n_samples)?;

    let report = screen_trials(emg, cfg)?;
    let kept = report.kept();
    let mut summary = SubjectSummary {
        subject_id: subject_id.to_string(),
        n_trials,
        n_kept: kept.len(),
        ..SubjectSummary::default()
    };
    if kept.is_empty() {
        warn!("{subject_id}: all {n_trials} trials rejected");
        return Ok(summary);
    }

    // Pooled baseline over every kept trial, before any detection.
    let kept_emg = emg.select(Axis(1), &kept);
    let hw = &cfg.hamada1.window;
    let pooled = segment(kept_emg.view(), cfg.fs, cfg.trigger_time, hw.t_min, hw.t_max)?;
    let detector = Detector::new(cfg).with_pooled_baseline(pooled.view());

    for &trial in &kept {
        let epoch = Epoch::from_trial(emg.column(trial), cfg.fs, cfg.trigger_time, &cfg.mep_window)?;
        for (method, result) in detector.detect_all(&epoch) {
            match result {
                Ok(latency) => {
                    if !latency.is_found() {
                        summary.n_not_found += 1;
                    }
                    sink.emit(LatencyRecord {
                        subject_id: subject_id.to_string(),
                        trial_index: trial,
                        method,
                        latency,
                    })?;
                    summary.n_records += 1;
                }
                Err(e) => {
                    warn!("{subject_id}: trial {trial} {method}: {e}");
                    summary.n_failed += 1;
                }
            }
        }
    }

    info!(
        "{subject_id}: kept {}/{} trials, {} rows ({} not found)",
        summary.n_kept, summary.n_trials, summary.n_records, summary.n_not_found
    );
    Ok(summary)
}

/// The configuration to use for `rec`: the recording's own sampling rate wins.
fn subject_config<'a>(rec: &SubjectRecording, cfg: &'a AnalysisConfig) -> std::borrow::Cow<'a, AnalysisConfig> {
    match rec.fs {
        Some(fs) if fs != cfg.fs => {
            info!("{}: using recorded sampling rate {fs} Hz", rec.subject_id);
            std::borrow::Cow::Owned(AnalysisConfig { fs, ..cfg.clone() })
        }
        _ => std::borrow::Cow::Borrowed(cfg),
    }
}

/// `Ok(None)` for subject-level faults that were logged and skipped.
fn skip_subject_faults(subject_id: &str, result: Result<SubjectSummary>) -> Result<Option<SubjectSummary>> {
    match result {
        Ok(summary) => Ok(Some(summary)),
        Err(e) => match e.downcast_ref::<MeplError>() {
            Some(fault) => {
                warn!("{subject_id}: skipped: {fault}");
                Ok(None)
            }
            None => Err(e),
        },
    }
}

/// Process subjects one after another.
///
/// Subjects that fail to load, or whose data or configuration is invalid,
/// are logged and skipped; a sink failure stops the run.
pub fn process_dataset<I, S>(subjects: I, cfg: &AnalysisConfig, sink: &mut S) -> Result<Vec<SubjectSummary>>
where
    I: IntoIterator<Item = Result<SubjectRecording>>,
    S: RecordSink + ?Sized,
{
    let mut summaries = Vec::new();
    for loaded in subjects {
        let rec = match loaded {
            Ok(rec) => rec,
            Err(e) => {
                warn!("skipping subject: {e:#}");
                continue;
            }
        };
        let cfg = subject_config(&rec, cfg);
        let result = process_subject(&rec.subject_id, rec.emg.view(), &cfg, sink);
        if let Some(summary) = skip_subject_faults(&rec.subject_id, result)? {
            summaries.push(summary);
        }
    }
    Ok(summaries)
}

/// Process subjects concurrently; rows reach `sink` in subject order.
#[cfg(feature = "parallel")]
pub fn process_dataset_parallel<S>(
    subjects: &[SubjectRecording],
    cfg: &AnalysisConfig,
    sink: &mut S,
) -> Result<Vec<SubjectSummary>>
where
    S: RecordSink + ?Sized,
{
    use rayon::prelude::*;

    let results: Vec<(Vec<LatencyRecord>, Result<SubjectSummary>)> = subjects
        .par_iter()
        .map(|rec| {
            let cfg = subject_config(rec, cfg);
            let mut rows = Vec::new();
            let result = process_subject(&rec.subject_id, rec.emg.view(), &cfg, &mut rows);
            (rows, result)
        })
        .collect();

    let mut summaries = Vec::new();
    for (rec, (rows, result)) in subjects.iter().zip(results) {
        if let Some(summary) = skip_subject_faults(&rec.subject_id, result)? {
            for row in rows {
                sink.emit(row)?;
            }
            summaries.push(summary);
        }
    }
    Ok(summaries)
}
