/// mepl: run every onset method on every subject of a data directory and
/// write one CSV row per (subject, kept trial, method).
///
/// With `--ground-truth`, the rows are joined with the annotation table and a
/// per-method error summary is printed.
use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use mepl::{
    compare, io::load_subjects, AnalysisConfig, CsvSink, GroundTruth,
    LatencyRecord, Method, RecordSink,
};

#[derive(Parser, Debug)]
#[command(name = "mepl", about = "MEP onset latency estimation")]
struct Args {
    /// Directory holding one `<subject_id>/emg.safetensors` per subject.
    #[arg(long)]
    data_dir: PathBuf,

    /// Result CSV path.
    #[arg(long)]
    output: PathBuf,

    /// Annotation CSV (subject_id, trial_index, latency) to compare against.
    #[arg(long)]
    ground_truth: Option<PathBuf>,

    /// JSON analysis configuration; missing fields take their defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Methods to run (comma-separated), overriding the configuration.
    #[arg(long, value_delimiter = ',')]
    methods: Vec<String>,
}

fn load_config(args: &Args) -> Result<AnalysisConfig> {
    let mut cfg = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?
        }
        None => AnalysisConfig::default(),
    };
    if !args.methods.is_empty() {
        cfg.methods = args
            .methods
            .iter()
            .map(|m| Method::from_name(m.trim()).with_context(|| format!("unknown method '{m}'")))
            .collect::<Result<_>>()?;
    }
    Ok(cfg)
}

/// Writes every row to the CSV and keeps a copy only when a comparison
/// will need it.
struct Tee<W: Write> {
    csv: CsvSink<W>,
    kept: Option<Vec<LatencyRecord>>,
    n_rows: usize,
}

impl<W: Write> RecordSink for Tee<W> {
    fn emit(&mut self, record: LatencyRecord) -> std::io::Result<()> {
        if let Some(kept) = &mut self.kept {
            kept.push(record.clone());
        }
        self.n_rows += 1;
        self.csv.emit(record)
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    let cfg = load_config(&args)?;
    let truth = args.ground_truth.as_deref().map(GroundTruth::load).transpose()?;

    let file = File::create(&args.output)
        .with_context(|| format!("creating {}", args.output.display()))?;
    let mut sink = Tee {
        csv: CsvSink::new(BufWriter::new(file)),
        kept: truth.as_ref().map(|_| Vec::new()),
        n_rows: 0,
    };

    #[cfg(feature = "parallel")]
    let summaries = {
        let subjects: Vec<_> = load_subjects(&args.data_dir)?
            .filter_map(|r| r.map_err(|e| log::warn!("skipping subject: {e:#}")).ok())
            .collect();
        mepl::process_dataset_parallel(&subjects, &cfg, &mut sink)?
    };
    #[cfg(not(feature = "parallel"))]
    let summaries = mepl::process_dataset(load_subjects(&args.data_dir)?, &cfg, &mut sink)?;
    sink.csv.into_inner()?;

    let n_kept: usize = summaries.iter().map(|s| s.n_kept).sum();
    let n_trials: usize = summaries.iter().map(|s| s.n_trials).sum();
    println!(
        "Processed {} subjects: kept {n_kept}/{n_trials} trials, {} rows",
        summaries.len(),
        sink.n_rows
    );
    println!("Written → {}", args.output.display());

    if let (Some(truth), Some(rows)) = (truth, sink.kept) {
        info!("{} annotated trials", truth.len());
        println!("\nAbsolute onset error vs. annotations (samples @ {} Hz):", cfg.fs);
        for cmp in compare(&rows, &truth) {
            println!("  {cmp}");
        }
    }

    Ok(())
}
