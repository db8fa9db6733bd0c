//! File I/O: subject recordings, result tables and the annotation corpus.
//!
//! * Reader: a subject is one safetensors file holding an `emg` tensor
//!   `[samples, trials]` (F32 or F64) and, optionally, an `fs` scalar.
//! * [`SubjectRecording::save`]: writes such a file back.
//! * [`CsvSink`]: streams [`LatencyRecord`]s as CSV.
//! * [`write_annotation_corpus`]: kept MEP windows as JSON lines for the
//!   manual annotation tool.
use anyhow::{bail, Context, Result};
use ndarray::Array2;
use serde::Serialize;
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::pipeline::{LatencyRecord, RecordSink, SubjectRecording};

/// File name of a subject recording inside its directory.
pub const SUBJECT_FILE: &str = "emg.safetensors";

// ── Low-level safetensors parser ─────────────────────────────────────────────

fn parse_header(bytes: &[u8]) -> Result<(HashMap<String, serde_json::Value>, usize)> {
    if bytes.len() < 8 {
        bail!("safetensors file too small");
    }
    let n = u64::from_le_bytes(bytes[..8].try_into()?) as usize;
    if bytes.len() < 8 + n {
        bail!("safetensors header truncated");
    }
    let header: HashMap<String, serde_json::Value> =
        serde_json::from_slice(&bytes[8..8 + n])
            .context("failed to parse safetensors header")?;
    Ok((header, 8 + n))
}

fn read_f64_tensor(
    bytes: &[u8],
    data_start: usize,
    entry: &serde_json::Value,
) -> Result<Vec<f64>> {
    let offsets = entry["data_offsets"].as_array().context("missing data_offsets")?;
    let (s, e) = match (offsets.first().and_then(|v| v.as_u64()), offsets.get(1).and_then(|v| v.as_u64())) {
        (Some(s), Some(e)) => (s as usize, e as usize),
        _ => bail!("malformed data_offsets"),
    };
    let raw = bytes
        .get(data_start + s..data_start + e)
        .context("tensor data out of bounds")?;
    let dtype = entry["dtype"].as_str().context("missing dtype")?;
    Ok(match dtype {
        "F32" => raw.chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]) as f64)
            .collect(),
        "F64" => raw.chunks_exact(8)
            .map(|b| f64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]))
            .collect(),
        other => bail!("unsupported dtype {other}"),
    })
}

fn shape_of(entry: &serde_json::Value) -> Result<Vec<usize>> {
    entry["shape"]
        .as_array()
        .context("missing shape")?
        .iter()
        .map(|v| v.as_u64().map(|d| d as usize).context("bad shape entry"))
        .collect()
}

// ── Subject recordings ───────────────────────────────────────────────────────

impl SubjectRecording {
    /// Load `path` as the recording of `subject_id`.
    pub fn load(subject_id: &str, path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let (header, data_start) = parse_header(&bytes)?;

        let emg_entry = header.get("emg").context("missing 'emg' key")?;
        let shape = shape_of(emg_entry)?;
        if shape.len() != 2 {
            bail!("'emg' must be [samples, trials], got shape {shape:?}");
        }
        let values = read_f64_tensor(&bytes, data_start, emg_entry)?;
        let emg = Array2::from_shape_vec((shape[0], shape[1]), values)?;

        // Sampling rate is optional.
        let fs = match header.get("fs") {
            Some(e) => Some(*read_f64_tensor(&bytes, data_start, e)?
                .first()
                .context("empty 'fs' tensor")?),
            None => None,
        };

        Ok(SubjectRecording { subject_id: subject_id.to_string(), emg, fs })
    }
}

/// Subject directories under `data_dir`, sorted by name, each paired with
/// the path its recording is expected at.
pub fn discover_subjects(data_dir: &Path) -> Result<Vec<(String, PathBuf)>> {
    let mut subjects = Vec::new();
    for entry in std::fs::read_dir(data_dir)
        .with_context(|| format!("listing {}", data_dir.display()))?
    {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            let id = entry.file_name().to_string_lossy().into_owned();
            subjects.push((id, entry.path().join(SUBJECT_FILE)));
        }
    }
    subjects.sort();
    Ok(subjects)
}

/// Lazily load every subject under `data_dir`.  A subject that cannot be
/// read yields an `Err` item and does not stop the iteration.
pub fn load_subjects(data_dir: &Path) -> Result<impl Iterator<Item = Result<SubjectRecording>>> {
    Ok(discover_subjects(data_dir)?
        .into_iter()
        .map(|(id, path)| SubjectRecording::load(&id, &path).with_context(|| format!("subject {id}"))))
}

// ── Writer ───────────────────────────────────────────────────────────────────

/// One tensor to be written: name, dtype tag, shape, little-endian bytes.
struct Tensor<'a> {
    name: &'a str,
    dtype: &'static str,
    shape: Vec<usize>,
    bytes: Vec<u8>,
}

impl<'a> Tensor<'a> {
    fn f64(name: &'a str, shape: Vec<usize>, values: impl IntoIterator<Item = f64>) -> Self {
        let bytes = values.into_iter().flat_map(f64::to_le_bytes).collect();
        Tensor { name, dtype: "F64", shape, bytes }
    }

    #[cfg(test)]
    fn f32(name: &'a str, shape: Vec<usize>, values: impl IntoIterator<Item = f32>) -> Self {
        let bytes = values.into_iter().flat_map(f32::to_le_bytes).collect();
        Tensor { name, dtype: "F32", shape, bytes }
    }
}

/// Header (padded to 8 bytes) followed by the tensors back to back.
fn write_tensors(path: &Path, tensors: &[Tensor]) -> Result<()> {
    let mut header = serde_json::Map::new();
    let mut offset = 0usize;
    for t in tensors {
        let end = offset + t.bytes.len();
        header.insert(
            t.name.to_string(),
            serde_json::json!({ "dtype": t.dtype, "shape": t.shape, "data_offsets": [offset, end] }),
        );
        offset = end;
    }
    let mut header = serde_json::to_vec(&header)?;
    header.resize(header.len().next_multiple_of(8), b' ');

    let file = std::fs::File::create(path)
        .with_context(|| format!("creating {}", path.display()))?;
    let mut out = std::io::BufWriter::new(file);
    out.write_all(&(header.len() as u64).to_le_bytes())?;
    out.write_all(&header)?;
    for t in tensors {
        out.write_all(&t.bytes)?;
    }
    out.flush()?;
    Ok(())
}

impl SubjectRecording {
    /// Write this recording in the layout [`SubjectRecording::load`] reads:
    /// `emg` as F64 `[samples, trials]`, plus `fs` when known.
    ///
    /// ```rust,no_run
    /// use mepl::SubjectRecording;
    /// use ndarray::Array2;
    /// use std::path::Path;
    ///
    /// let rec = SubjectRecording {
    ///     subject_id: "s01".into(),
    ///     emg: Array2::zeros((10_000, 30)),
    ///     fs: Some(5000.0),
    /// };
    /// rec.save(Path::new("data/s01/emg.safetensors")).unwrap();
    /// ```
    pub fn save(&self, path: &Path) -> Result<()> {
        let (n_samples, n_trials) = self.emg.dim();
        let mut tensors = vec![Tensor::f64("emg", vec![n_samples, n_trials], self.emg.iter().copied())];
        if let Some(fs) = self.fs {
            tensors.push(Tensor::f64("fs", vec![1], [fs]));
        }
        write_tensors(path, &tensors)
    }
}

// ── Result table ─────────────────────────────────────────────────────────────

/// Header of the result table.  Column names are the join keys shared with
/// annotation tables.
pub const RESULT_HEADER: &str = "subject_id,trial_index,method,latency";

/// Quote a CSV field when it contains a separator, a quote or a line break.
pub(crate) fn csv_field(value: &str) -> std::borrow::Cow<'_, str> {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\"")).into()
    } else {
        value.into()
    }
}

/// Split one CSV line into fields, honouring double-quoted fields.
pub(crate) fn split_csv_line(line: &str) -> Result<Vec<String>> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut chars = line.chars().peekable();
    let mut quoted = false;
    while let Some(c) = chars.next() {
        match (quoted, c) {
            (true, '"') if chars.peek() == Some(&'"') => {
                chars.next();
                field.push('"');
            }
            (true, '"') => quoted = false,
            (false, '"') if field.trim().is_empty() => {
                field.clear();
                quoted = true;
            }
            (false, ',') => fields.push(std::mem::take(&mut field)),
            _ => field.push(c),
        }
    }
    if quoted {
        bail!("unterminated quoted field");
    }
    fields.push(field);
    Ok(fields)
}

/// Streams records as CSV rows; `latency` is left empty when not found.
/// Subject ids are quoted when needed.
pub struct CsvSink<W: Write> {
    out: W,
    header_written: bool,
}

impl<W: Write> CsvSink<W> {
    pub fn new(out: W) -> Self {
        Self { out, header_written: false }
    }

    pub fn into_inner(mut self) -> std::io::Result<W> {
        self.write_header()?;
        self.out.flush()?;
        Ok(self.out)
    }

    fn write_header(&mut self) -> std::io::Result<()> {
        if !self.header_written {
            writeln!(self.out, "{RESULT_HEADER}")?;
            self.header_written = true;
        }
        Ok(())
    }
}

impl<W: Write> RecordSink for CsvSink<W> {
    fn emit(&mut self, record: LatencyRecord) -> std::io::Result<()> {
        self.write_header()?;
        let latency = record.latency.index().map(|i| i.to_string()).unwrap_or_default();
        writeln!(
            self.out,
            "{},{},{},{}",
            csv_field(&record.subject_id), record.trial_index, record.method, latency
        )
    }
}

// ── Annotation corpus ────────────────────────────────────────────────────────

/// One MEP window handed to the manual annotation tool.
#[derive(Debug, Clone, Serialize)]
pub struct AnnotationItem<'a> {
    pub subject_id: &'a str,
    pub trial_index: usize,
    pub mep: &'a [f64],
}

/// Write `items` as JSON lines.
pub fn write_annotation_corpus<'a, W: Write>(
    out: &mut W,
    items: impl IntoIterator<Item = AnnotationItem<'a>>,
) -> Result<usize> {
    let mut n = 0;
    for item in items {
        serde_json::to_writer(&mut *out, &item)?;
        out.write_all(b"\n")?;
        n += 1;
    }
    Ok(n)
}
