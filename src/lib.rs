//! # mepl — MEP onset latency estimation
//!
//! `mepl` estimates the onset latency of motor evoked potentials (MEPs) in
//! single-trial EMG recorded around transcranial magnetic stimulation, using
//! six published onset criteria, and compares them against manual
//! annotations.
//!
//! ## Pipeline overview
//!
//! ```text
//! <data_dir>/<subject_id>/emg.safetensors     emg [samples, trials], fs
//!   │
//!   ├─ epoch::segment()           trigger-relative windows (MEP, baseline)
//!   ├─ quality::evaluate_trials() amplitude, shape and baseline-noise criteria
//!   ├─ pooled baseline            over all kept trials (Hamada-1)
//!   ├─ onset::Detector            bigoni | hamada1 | hamada2 | huang
//!   │                             | daskalakis | garvey
//!   └─ RecordSink                 (subject_id, trial_index, method, latency)
//!        │
//!        └─→ report::compare()    |error| vs. annotations, per method
//! ```
//!
//! ## Quick start
//!
//! ```no_run
//! use mepl::{process_subject, AnalysisConfig, LatencyRecord};
//! use mepl::pipeline::SubjectRecording;
//! use std::path::Path;
//!
//! let rec = SubjectRecording::load("s01", Path::new("data/s01/emg.safetensors")).unwrap();
//! let cfg = AnalysisConfig { fs: rec.fs.unwrap_or(5000.0), ..AnalysisConfig::default() };
//!
//! let mut rows: Vec<LatencyRecord> = Vec::new();
//! let summary = process_subject(&rec.subject_id, rec.emg.view(), &cfg, &mut rows).unwrap();
//! println!("kept {} of {} trials", summary.n_kept, summary.n_trials);
//! for r in &rows {
//!     println!("{} {} {}", r.trial_index, r.method, r.latency);
//! }
//! ```
//!
//! ## Running individual steps
//!
//! ```no_run
//! use mepl::{Detector, Epoch, Method, AnalysisConfig};
//! use ndarray::Array1;
//!
//! let cfg = AnalysisConfig::default();
//! let trial: Array1<f64> = Array1::zeros(10_000);      // one trial, 2 s @ 5 kHz
//!
//! let epoch = Epoch::from_trial(trial.view(), cfg.fs, cfg.trigger_time, &cfg.mep_window).unwrap();
//! let latency = Detector::new(&cfg).detect(&epoch, Method::Huang).unwrap();
//! println!("{latency} ({:?} ms)", latency.to_ms(cfg.fs));
//! ```

pub mod config;
pub mod epoch;
pub mod error;
pub mod io;
pub mod onset;
pub mod pipeline;
pub mod quality;
pub mod report;
pub mod stats;

// ── Crate-root re-exports ─────────────────────────────────────────────────

// config
pub use config::{
    AnalysisConfig, TimeWindow, QualityConfig,
    DerivativeConfig, PooledThresholdConfig, TrialThresholdConfig,
    SdMultipleConfig, LastCrossingConfig, McdConfig,
};

// epoch
pub use epoch::{segment, segment_1d, window_bounds, Epoch};

// error
pub use error::MeplError;

// onset
pub use onset::{
    Detector, Latency, Method, PooledBaseline,
    latency_bigoni, latency_hamada1, latency_hamada2, latency_huang,
    latency_daskalakis, latency_garvey,
};

// quality
pub use quality::{evaluate_trials, QualityReport};

// pipeline
pub use pipeline::{
    process_subject, process_dataset, kept_epochs,
    LatencyRecord, RecordSink, SubjectRecording, SubjectSummary,
};
#[cfg(feature = "parallel")]
pub use pipeline::process_dataset_parallel;

// io
pub use io::CsvSink;

// report
pub use report::{compare, GroundTruth, MethodComparison};
