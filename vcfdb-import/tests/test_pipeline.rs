use std::sync::Arc;
use std::thread;
use std::time::Duration;

use pretty_assertions::assert_eq;
use rstest::*;
use serde_json::json;

use vcfdb_core::{ErrorKind, Result, SampleCall, VariantRecord, VcfdbError};
use vcfdb_import::{ImportConfig, LoadMode, Pipeline, PipelineReport, Stage};
use vcfdb_store::{DocumentStore, Filter, MemoryStore};
use vcfdb_vcf::RecordStream;

fn record(tag: &str, pos: u64, samples: usize) -> VariantRecord {
    let mut record = VariantRecord::new("chr1", pos, "A");
    record.id = Some(format!("{}{}", tag, pos));
    record.samples = vec![SampleCall::with_genotype(["A", "A"]); samples];
    record
}

fn stream(records: Vec<Result<VariantRecord>>) -> RecordStream {
    Box::new(records.into_iter())
}

fn file(tag: &str, positions: &[u64], samples: usize) -> RecordStream {
    stream(positions.iter().map(|p| Ok(record(tag, *p, samples))).collect())
}

#[fixture]
fn config() -> ImportConfig {
    ImportConfig {
        chunk_size: 2,
        show_progress: false,
        ..Default::default()
    }
}

fn run(
    store: &Arc<MemoryStore>,
    config: ImportConfig,
    sources: Vec<RecordStream>,
    counts: Vec<usize>,
) -> PipelineReport {
    let store: Arc<dyn DocumentStore> = store.clone();
    Pipeline::new(store, "calls", LoadMode::Direct, config)
        .run(sources, counts)
        .unwrap()
}

#[rstest]
fn test_two_files_interleaved(config: ImportConfig) {
    let store = Arc::new(MemoryStore::new());
    let report = run(
        &store,
        config,
        vec![file("a", &[100, 200], 1), file("b", &[150, 200], 1)],
        vec![1, 1],
    );
    assert!(report.success());
    assert_eq!(report.imported, 3);

    let doc = |id: &str| serde_json::Value::Object(store.get("calls", id).unwrap().unwrap());
    assert_eq!(doc("chr1:100")["IDs"], json!(["a100", null]));
    assert_eq!(doc("chr1:100")["samples"], json!([{"GT": ["A", "A"]}, null]));
    assert_eq!(doc("chr1:150")["IDs"], json!([null, "b150"]));
    assert_eq!(doc("chr1:150")["INFOs"], json!([null, {}]));
    assert_eq!(doc("chr1:200")["IDs"], json!(["a200", "b200"]));
    assert_eq!(doc("chr1:200")["samples"].as_array().unwrap().len(), 2);
}

#[rstest]
fn test_terminates_for_every_pool_size(
    #[values(1, 3)] parsers: usize,
    #[values(1, 2, 3)] mergers: usize,
    #[values(1, 2)] loaders: usize,
) {
    let store = Arc::new(MemoryStore::new());
    let sources: Vec<RecordStream> = (0..parsers)
        .map(|n| {
            let positions: Vec<u64> = (1..=60).filter(|p| p % (n as u64 + 1) == 0).collect();
            file("f", &positions, 1)
        })
        .collect();
    let config = ImportConfig {
        chunk_size: 7,
        merger_workers: mergers,
        loader_workers: loaders,
        parser_buffer_size: 1,
        merger_buffer_size: 2,
        loader_buffer_size: 1,
        show_progress: false,
        ..Default::default()
    };

    let report = run(&store, config, sources, vec![1; parsers]);
    assert!(report.success());
    assert_eq!(report.imported, 60);
    assert_eq!(store.count("calls", &Filter::All).unwrap(), 60);
    assert_eq!(
        store.count("calls", &Filter::array_len("IDs", parsers)).unwrap(),
        60
    );
}

#[rstest]
#[case::drop(true)]
#[case::abort(false)]
fn test_bad_group(config: ImportConfig, #[case] drop_bad_records: bool) {
    let store = Arc::new(MemoryStore::new());
    // the record at 20 has no sample call although the file declares one
    let source = stream(vec![
        Ok(record("a", 10, 1)),
        Ok(record("a", 20, 0)),
        Ok(record("a", 30, 1)),
    ]);
    let config = ImportConfig {
        drop_bad_records,
        ..config
    };

    let report = run(&store, config, vec![source], vec![1]);
    if drop_bad_records {
        assert!(report.success());
        assert_eq!(report.imported, 2);
        assert_eq!(report.dropped.len(), 1);
        assert_eq!(report.dropped[0].locus.document_id(), "chr1:20");
        assert_eq!(report.dropped[0].error.kind(), ErrorKind::Merge);
    } else {
        assert!(!report.success());
        assert!(report.errors.iter().any(|e| e.stage == Stage::Merge));
    }
}

#[rstest]
fn test_existing_locus_fails_the_load(config: ImportConfig) {
    let store = Arc::new(MemoryStore::new());
    store
        .insert("calls", json!({"_id": "chr1:30"}).as_object().unwrap().clone())
        .unwrap();
    let positions: Vec<u64> = (1..=40).collect();

    let report = run(&store, config, vec![file("a", &positions, 0)], vec![0]);
    assert!(!report.success());
    let load = report
        .errors
        .iter()
        .find(|e| e.stage == Stage::Load)
        .unwrap();
    assert_eq!(load.error.kind(), ErrorKind::Storage);
}

#[rstest]
#[case::unsorted(
    vec![Ok(record("a", 10, 0)), Ok(record("a", 5, 0))],
    Stage::Align
)]
#[case::undecodable(
    vec![Ok(record("a", 10, 0)), Err(VcfdbError::Decode("line 12: bad POS".to_string()))],
    Stage::Parse
)]
fn test_upstream_failures(
    config: ImportConfig,
    #[case] records: Vec<Result<VariantRecord>>,
    #[case] stage: Stage,
) {
    let store = Arc::new(MemoryStore::new());
    let report = run(
        &store,
        config,
        vec![stream(records), file("b", &[1, 2, 3], 0)],
        vec![0, 0],
    );
    assert!(!report.success());
    assert!(report.errors.iter().any(|e| e.stage == stage));
}

#[rstest]
fn test_no_writes_after_an_aborted_run() {
    let store = Arc::new(MemoryStore::new());
    let config = ImportConfig {
        chunk_size: 5,
        loader_workers: 3,
        parser_buffer_size: 2,
        merger_buffer_size: 2,
        loader_buffer_size: 2,
        show_progress: false,
        ..Default::default()
    };
    let positions: Vec<u64> = (1..=20_000).collect();
    let failing = stream(vec![
        Ok(record("b", 1, 0)),
        Err(VcfdbError::Decode("line 2: bad POS".to_string())),
    ]);

    let report = run(&store, config, vec![file("a", &positions, 0), failing], vec![0, 0]);
    assert!(report.aborted);
    assert!(report.errors.iter().any(|e| e.stage == Stage::Parse));

    let written = store.count("calls", &Filter::All).unwrap();
    assert_eq!(written as u64, report.imported);
    thread::sleep(Duration::from_millis(400));
    assert_eq!(store.count("calls", &Filter::All).unwrap(), written);
    assert!(written < positions.len());
}

#[rstest]
fn test_mismatched_sample_counts_are_rejected(config: ImportConfig) {
    let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
    let err = Pipeline::new(store, "calls", LoadMode::Direct, config)
        .run(vec![file("a", &[1], 0)], vec![])
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Config);
}
