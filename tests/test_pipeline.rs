mod common;
use common::{default_cfg, synthetic_recording, write_subject, FS, ONSET_IN_WINDOW};
use mepl::{
    compare, io::load_subjects, kept_epochs, process_dataset, process_subject, CsvSink,
    GroundTruth, LatencyRecord, Method, RecordSink,
};
use ndarray::Array2;
use std::collections::BTreeSet;

#[test]
fn ten_trials_two_small_keeps_eight_with_original_indices() {
    let emg = synthetic_recording(10, &[3, 7]);
    let cfg = default_cfg();
    let mut rows: Vec<LatencyRecord> = Vec::new();
    let summary = process_subject("s01", emg.view(), &cfg, &mut rows).unwrap();

    assert_eq!(summary.n_trials, 10);
    assert_eq!(summary.n_kept, 8);
    assert_eq!(summary.n_failed, 0);
    assert_eq!(rows.len(), 8 * Method::ALL.len());
    assert_eq!(summary.n_records, rows.len());

    let trials: BTreeSet<usize> = rows.iter().map(|r| r.trial_index).collect();
    assert_eq!(trials, BTreeSet::from([0, 1, 2, 4, 5, 6, 8, 9]));
    assert!(rows.iter().all(|r| r.subject_id == "s01"));
    assert!(rows.iter().all(|r| r.latency.is_found()));

    // rows come out trial by trial, methods in configuration order
    let first: Vec<Method> = rows[..Method::ALL.len()].iter().map(|r| r.method).collect();
    assert_eq!(first, Method::ALL.to_vec());
    for r in rows.iter().filter(|r| r.method == Method::Huang) {
        assert_eq!(r.latency.index(), Some(ONSET_IN_WINDOW + 1));
    }
}

#[test]
fn kept_epochs_match_pipeline_selection() {
    let emg = synthetic_recording(10, &[3, 7]);
    let epochs = kept_epochs(emg.view(), &default_cfg()).unwrap();
    let idx: Vec<usize> = epochs.iter().map(|(i, _)| *i).collect();
    assert_eq!(idx, vec![0, 1, 2, 4, 5, 6, 8, 9]);
    assert!(epochs.iter().all(|(_, mep)| mep.len() == 200));
}

#[test]
fn dataset_from_disk_skips_bad_subjects() {
    let dir = tempfile::tempdir().unwrap();
    write_subject(dir.path(), "s02", &synthetic_recording(6, &[]), Some(FS));
    write_subject(dir.path(), "s01", &synthetic_recording(10, &[3, 7]), None);
    // one trial only
    write_subject(dir.path(), "s03", &synthetic_recording(1, &[]), Some(FS));
    // too short for the configured windows
    write_subject(dir.path(), "s04", &Array2::zeros((3000, 5)), Some(FS));
    // directory without a recording
    std::fs::create_dir(dir.path().join("s05")).unwrap();

    let cfg = default_cfg();
    let mut rows: Vec<LatencyRecord> = Vec::new();
    let summaries = process_dataset(load_subjects(dir.path()).unwrap(), &cfg, &mut rows).unwrap();

    let ids: Vec<&str> = summaries.iter().map(|s| s.subject_id.as_str()).collect();
    assert_eq!(ids, vec!["s01", "s02"]);
    assert_eq!(summaries[0].n_kept, 8);
    assert_eq!(summaries[1].n_kept, 6);
    assert_eq!(rows.len(), (8 + 6) * Method::ALL.len());
    assert_eq!(rows[0].subject_id, "s01");
    assert_eq!(rows.last().unwrap().subject_id, "s02");
}

#[test]
fn csv_output_joins_with_annotations() {
    let emg = synthetic_recording(4, &[]);
    let cfg = mepl::AnalysisConfig { methods: vec![Method::Bigoni, Method::Huang], ..default_cfg() };

    let mut rows: Vec<LatencyRecord> = Vec::new();
    process_subject("s01", emg.view(), &cfg, &mut rows).unwrap();

    let mut sink = CsvSink::new(Vec::new());
    for r in &rows {
        sink.emit(r.clone()).unwrap();
    }
    let csv = String::from_utf8(sink.into_inner().unwrap()).unwrap();
    let mut lines = csv.lines();
    assert_eq!(lines.next(), Some("subject_id,trial_index,method,latency"));
    assert_eq!(lines.next(), Some(format!("s01,0,bigoni,{ONSET_IN_WINDOW}").as_str()));

    let truth = GroundTruth::from_csv_str(&format!(
        "subject_id,trial_index,latency\ns01,0,{a}\ns01,1,{a}\ns01,2,nan\n",
        a = ONSET_IN_WINDOW + 2
    ))
    .unwrap();
    let cmp = compare(&rows, &truth);
    assert_eq!(cmp.len(), 2);
    let bigoni = &cmp[0];
    assert_eq!((bigoni.method, bigoni.n_compared, bigoni.n_missing), (Method::Bigoni, 2, 2));
    approx::assert_abs_diff_eq!(bigoni.mean_abs_error.unwrap(), 2.0, epsilon = 1e-12);
    let huang = &cmp[1];
    approx::assert_abs_diff_eq!(huang.mean_abs_error.unwrap(), 1.0, epsilon = 1e-12);
    approx::assert_abs_diff_eq!(huang.std_abs_error.unwrap(), 0.0, epsilon = 1e-12);
}

#[cfg(feature = "parallel")]
#[test]
fn parallel_driver_preserves_subject_order() {
    use mepl::{process_dataset_parallel, SubjectRecording};
    let cfg = default_cfg();
    let subjects: Vec<SubjectRecording> = (0..4)
        .map(|i| SubjectRecording {
            subject_id: format!("s{i:02}"),
            emg: synthetic_recording(5 + i, &[]),
            fs: None,
        })
        .collect();
    let mut par: Vec<LatencyRecord> = Vec::new();
    process_dataset_parallel(&subjects, &cfg, &mut par).unwrap();
    let mut seq: Vec<LatencyRecord> = Vec::new();
    process_dataset(subjects.into_iter().map(Ok), &cfg, &mut seq).unwrap();
    assert_eq!(par, seq);
}
