/// export_meps: write the kept MEP windows of every subject as JSON lines
/// `{subject_id, trial_index, mep}` for manual onset annotation.
use anyhow::{Context, Result};
use clap::Parser;
use log::warn;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use mepl::{
    io::{load_subjects, write_annotation_corpus, AnnotationItem},
    kept_epochs, AnalysisConfig,
};

#[derive(Parser, Debug)]
#[command(name = "export_meps", about = "Export kept MEP windows for annotation")]
struct Args {
    /// Directory holding one `<subject_id>/emg.safetensors` per subject.
    #[arg(long)]
    data_dir: PathBuf,

    /// JSON-lines output path.
    #[arg(long)]
    output: PathBuf,

    /// JSON analysis configuration; missing fields take their defaults.
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let cfg: AnalysisConfig = match &args.config {
        Some(path) => serde_json::from_str(
            &std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?,
        )
        .with_context(|| format!("parsing {}", path.display()))?,
        None => AnalysisConfig::default(),
    };

    let file = File::create(&args.output)
        .with_context(|| format!("creating {}", args.output.display()))?;
    let mut out = BufWriter::new(file);
    let mut total = 0;

    for loaded in load_subjects(&args.data_dir)? {
        let rec = match loaded {
            Ok(rec) => rec,
            Err(e) => {
                warn!("skipping subject: {e:#}");
                continue;
            }
        };
        let cfg = AnalysisConfig { fs: rec.fs.unwrap_or(cfg.fs), ..cfg.clone() };
        let epochs = match kept_epochs(rec.emg.view(), &cfg) {
            Ok(epochs) => epochs,
            Err(e) => {
                warn!("{}: skipped: {e}", rec.subject_id);
                continue;
            }
        };
        let items = epochs.iter().map(|(trial, mep)| AnnotationItem {
            subject_id: &rec.subject_id,
            trial_index: *trial,
            mep: mep.as_slice().unwrap_or(&[]),
        });
        let n = write_annotation_corpus(&mut out, items)?;
        println!("{}: {n} MEPs", rec.subject_id);
        total += n;
    }

    out.flush()?;
    println!("Written {total} MEPs → {}", args.output.display());
    Ok(())
}
