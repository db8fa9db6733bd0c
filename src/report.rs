//! Comparison of detector output against manual annotations.
//!
//! The annotation table is a CSV with one row per annotated trial.  Column
//! names are matched case-insensitively, and a few spellings are accepted:
//!
//! | key           | accepted headers                       |
//! |---------------|----------------------------------------|
//! | subject       | `subject_id`, `sub_id`, `subject`      |
//! | trial         | `trial_index`, `trial`                 |
//! | latency       | `latency`, `lat`                       |
//!
//! An empty latency cell, `nan` or `not_found` marks a trial the annotator
//! judged to have no MEP.  Fractional latencies are rounded to the nearest
//! sample.  Fields may be double-quoted, as written by [`CsvSink`](crate::CsvSink).
use anyhow::{bail, Context, Result};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::Path;

use crate::io::split_csv_line;
use crate::onset::{Latency, Method};
use crate::pipeline::LatencyRecord;
use crate::stats;

/// Annotated latency per `(subject_id, trial_index)`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroundTruth {
    entries: HashMap<(String, usize), Latency>,
}

fn column(header: &[String], names: &[&str]) -> Result<usize> {
    header
        .iter()
        .position(|h| names.contains(&h.as_str()))
        .with_context(|| format!("annotation table has no {} column", names[0]))
}

fn parse_latency(cell: &str) -> Result<Latency> {
    let cell = cell.trim();
    if cell.is_empty() || cell.eq_ignore_ascii_case("nan") || cell == "not_found" {
        return Ok(Latency::NotFound);
    }
    let v: f64 = cell.parse().with_context(|| format!("bad latency '{cell}'"))?;
    if !v.is_finite() || v < 0.0 {
        bail!("bad latency '{cell}'");
    }
    Ok(Latency::Onset(v.round() as usize))
}

fn parse_trial(cell: &str) -> Result<usize> {
    let cell = cell.trim();
    // Annotation tools sometimes write integer columns as floats.
    match cell.parse::<usize>() {
        Ok(i) => Ok(i),
        Err(_) => {
            let v: f64 = cell.parse().with_context(|| format!("bad trial index '{cell}'"))?;
            if v.fract() != 0.0 || v < 0.0 {
                bail!("bad trial index '{cell}'");
            }
            Ok(v as usize)
        }
    }
}

impl GroundTruth {
    pub fn from_csv_str(text: &str) -> Result<Self> {
        let mut lines = text.lines().filter(|l| !l.trim().is_empty());
        let header: Vec<String> = split_csv_line(lines.next().context("annotation table is empty")?)?
            .iter()
            .map(|h| h.trim().to_ascii_lowercase())
            .collect();
        let c_subject = column(&header, &["subject_id", "sub_id", "subject"])?;
        let c_trial = column(&header, &["trial_index", "trial"])?;
        let c_latency = column(&header, &["latency", "lat"])?;

        let mut entries = HashMap::new();
        for (n, line) in lines.enumerate() {
            let row = n + 2;
            let cells = split_csv_line(line).with_context(|| format!("row {row}"))?;
            let cell = |c: usize| cells.get(c).map(String::as_str).unwrap_or("");
            let subject = cell(c_subject).trim().to_string();
            if subject.is_empty() {
                bail!("row {row}: missing subject");
            }
            let trial = parse_trial(cell(c_trial)).with_context(|| format!("row {row}"))?;
            let latency = parse_latency(cell(c_latency)).with_context(|| format!("row {row}"))?;
            entries.insert((subject, trial), latency);
        }
        Ok(Self { entries })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        Self::from_csv_str(&text).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn get(&self, subject_id: &str, trial_index: usize) -> Option<Latency> {
        self.entries.get(&(subject_id.to_string(), trial_index)).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Agreement of one method with the annotations, in samples.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodComparison {
    pub method: Method,
    /// Rows where both detector and annotator gave an onset.
    pub n_compared: usize,
    /// Rows where either side gave no onset, or no annotation exists.
    pub n_missing: usize,
    pub mean_abs_error: Option<f64>,
    pub std_abs_error: Option<f64>,
}

/// Join `records` with `truth` on `(subject_id, trial_index)` and summarise
/// the absolute error per method.  Methods come out in [`Method::ALL`] order.
pub fn compare<'a>(
    records: impl IntoIterator<Item = &'a LatencyRecord>,
    truth: &GroundTruth,
) -> Vec<MethodComparison> {
    let mut errors: BTreeMap<Method, (Vec<f64>, usize)> = BTreeMap::new();
    for r in records {
        let slot = errors.entry(r.method).or_default();
        let annotated = truth.get(&r.subject_id, r.trial_index);
        match (r.latency, annotated) {
            (Latency::Onset(d), Some(Latency::Onset(a))) => slot.0.push(d.abs_diff(a) as f64),
            _ => slot.1 += 1,
        }
    }
    errors
        .into_iter()
        .map(|(method, (abs_err, n_missing))| {
            let v = ndarray::Array1::from(abs_err);
            let (mean, std) = if v.is_empty() {
                (None, None)
            } else {
                (Some(stats::mean(v.view())), Some(stats::std(v.view())))
            };
            MethodComparison { method, n_compared: v.len(), n_missing, mean_abs_error: mean, std_abs_error: std }
        })
        .collect()
}

impl fmt::Display for MethodComparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:<12} n={:<6} missing={:<6}", self.method.name(), self.n_compared, self.n_missing)?;
        match (self.mean_abs_error, self.std_abs_error) {
            (Some(m), Some(s)) => write!(f, " |err| = {m:.2} ± {s:.2} samples"),
            _ => f.write_str(" |err| = n/a"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn rec(sub: &str, trial: usize, method: Method, latency: Latency) -> LatencyRecord {
        LatencyRecord { subject_id: sub.into(), trial_index: trial, method, latency }
    }

    #[test]
    fn header_aliases_and_no_mep_markers() {
        let gt = GroundTruth::from_csv_str("Sub_ID,Trial,Lat\ns01,0,12.4\ns01,1,nan\ns01,2,\ns02,3.0,7.5\n").unwrap();
        assert_eq!(gt.len(), 4);
        assert_eq!(gt.get("s01", 0), Some(Latency::Onset(12)));
        assert_eq!(gt.get("s01", 1), Some(Latency::NotFound));
        assert_eq!(gt.get("s01", 2), Some(Latency::NotFound));
        assert_eq!(gt.get("s02", 3), Some(Latency::Onset(8)));
        assert_eq!(gt.get("s02", 4), None);
    }

    #[test]
    fn quoted_subject_ids_keep_their_commas() {
        let gt = GroundTruth::from_csv_str("subject_id,trial_index,latency\n\"s,01 \"\"b\"\"\",2,7\n").unwrap();
        assert_eq!(gt.get("s,01 \"b\"", 2), Some(Latency::Onset(7)));
        assert_eq!(gt.get("s", 1), None);
    }

    #[test]
    fn missing_column_is_reported() {
        let err = GroundTruth::from_csv_str("subject_id,latency\ns01,3\n").unwrap_err();
        assert!(err.to_string().contains("trial_index"));
    }

    #[test]
    fn bad_latency_names_the_row() {
        let err = GroundTruth::from_csv_str("subject_id,trial_index,latency\ns01,0,3\ns01,1,abc\n").unwrap_err();
        assert!(format!("{err:#}").contains("row 3"));
    }

    #[test]
    fn compare_counts_missing_and_averages_errors() {
        let gt = GroundTruth::from_csv_str("subject_id,trial_index,latency\ns01,0,10\ns01,1,20\ns01,2,nan\n").unwrap();
        let records = vec![
            rec("s01", 0, Method::Huang, Latency::Onset(12)),
            rec("s01", 1, Method::Huang, Latency::Onset(16)),
            rec("s01", 2, Method::Huang, Latency::Onset(5)),
            rec("s01", 9, Method::Huang, Latency::Onset(5)),
            rec("s01", 0, Method::Bigoni, Latency::NotFound),
        ];
        let out = compare(&records, &gt);
        assert_eq!(out.len(), 2);

        assert_eq!(out[0].method, Method::Bigoni);
        assert_eq!(out[0].n_compared, 0);
        assert_eq!(out[0].n_missing, 1);
        assert_eq!(out[0].mean_abs_error, None);

        let huang = &out[1];
        assert_eq!(huang.n_compared, 2);
        assert_eq!(huang.n_missing, 2);
        assert_abs_diff_eq!(huang.mean_abs_error.unwrap(), 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(huang.std_abs_error.unwrap(), 1.0, epsilon = 1e-12);
        assert!(huang.to_string().contains("3.00"));
    }
}
