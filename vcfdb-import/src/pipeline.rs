use std::fmt::{self, Display};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, bounded, unbounded};
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, error, info, warn};
use serde_json::Value;

use vcfdb_core::consts::{FIELD_CHROM, FIELD_POS, FIELD_REF, FIELD_SAMPLES, PER_FILE_FIELDS};
use vcfdb_core::{Counter, Locus, MergedDocument, Result, VariantRecord, VcfdbError};
use vcfdb_store::{DocumentStore, Update, WriteOp};
use vcfdb_vcf::RecordStream;

use crate::aligner::{AlignedGroup, StreamAligner};
use crate::config::ImportConfig;
use crate::merger::merge_records;
use crate::message::{ChannelRecords, Message};

const POLL_INTERVAL: Duration = Duration::from_millis(200);

///
/// How load workers write merged documents.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMode {
    /// Insert every document; an existing `_id` fails the batch.
    Direct,
    /// Upsert into a collection that already holds `old_files` files and
    /// `old_samples` samples.
    Append {
        old_files: usize,
        old_samples: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Parse,
    Align,
    Merge,
    Load,
}

impl Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Stage::Parse => "parse",
            Stage::Align => "align",
            Stage::Merge => "merge",
            Stage::Load => "load",
        };
        write!(f, "{}", label)
    }
}

#[derive(Debug)]
pub struct StageError {
    pub stage: Stage,
    pub error: VcfdbError,
}

/// A group skipped in drop mode.
#[derive(Debug)]
pub struct DroppedRecord {
    pub locus: Locus,
    pub error: VcfdbError,
}

///
/// Outcome of one pipeline run.
///
#[derive(Debug)]
pub struct PipelineReport {
    /// Documents written by successful flushes.
    pub imported: u64,
    pub elapsed: Duration,
    pub dropped: Vec<DroppedRecord>,
    pub errors: Vec<StageError>,
    /// A fatal failure stopped the run, or a worker did not finish cleanly.
    pub aborted: bool,
}

impl PipelineReport {
    pub fn success(&self) -> bool {
        !self.aborted && self.errors.is_empty()
    }
}

/// Sets the fatal flag if the owning worker thread unwinds.
struct FatalOnPanic(Arc<AtomicBool>);

impl Drop for FatalOnPanic {
    fn drop(&mut self) {
        if thread::panicking() {
            self.0.store(true, Ordering::SeqCst);
        }
    }
}

/// Per-stage error collection plus the shared fatal flag.
#[derive(Clone)]
struct ErrorSink {
    tx: Sender<StageError>,
    fatal: Arc<AtomicBool>,
}

impl ErrorSink {
    fn fatal(&self, stage: Stage, error: VcfdbError) {
        error!("{} worker failed: {}", stage, error);
        let _ = self.tx.send(StageError { stage, error });
        self.fatal.store(true, Ordering::SeqCst);
    }

    /// Whether some worker has failed fatally.
    fn aborted(&self) -> bool {
        self.fatal.load(Ordering::SeqCst)
    }
}

///
/// The parse, align, merge and load stages of one import, connected by
/// bounded queues.
///
pub struct Pipeline {
    store: Arc<dyn DocumentStore>,
    collection: String,
    mode: LoadMode,
    config: ImportConfig,
}

impl Pipeline {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        collection: impl Into<String>,
        mode: LoadMode,
        config: ImportConfig,
    ) -> Self {
        Pipeline {
            store,
            collection: collection.into(),
            mode,
            config,
        }
    }

    ///
    /// Run every stage to completion, or until a fatal failure.
    ///
    /// `sample_counts[i]` is the number of samples of `sources[i]`. The returned
    /// error is reserved for setup failures; stage failures are reported in
    /// the [`PipelineReport`].
    ///
    /// Every worker is joined before this returns, so nothing is written to
    /// the store afterwards. Once a fatal failure is seen, workers stop at
    /// their next item and loaders discard what is still queued.
    ///
    pub fn run(&self, sources: Vec<RecordStream>, sample_counts: Vec<usize>) -> Result<PipelineReport> {
        self.config.validate()?;
        if sources.len() != sample_counts.len() {
            return Err(VcfdbError::Config(format!(
                "{} sources but {} sample counts",
                sources.len(),
                sample_counts.len()
            )));
        }

        let start = Instant::now();
        let merger_workers = self.config.merger_workers;
        let loader_workers = self.config.loader_workers;
        info!(
            "Starting import into `{}`: {} parsers, {} mergers, {} loaders",
            self.collection,
            sources.len(),
            merger_workers,
            loader_workers
        );

        let fatal = Arc::new(AtomicBool::new(false));
        let (error_txs, error_rxs): (Vec<_>, Vec<_>) =
            (0..4).map(|_| unbounded::<StageError>()).unzip();
        let sink = |index: usize| ErrorSink {
            tx: error_txs[index].clone(),
            fatal: Arc::clone(&fatal),
        };
        let (dropped_tx, dropped_rx) = unbounded::<DroppedRecord>();

        let counter = Arc::new(Counter::new());
        let finished_loaders = Arc::new(Counter::new());

        let (load_tx, load_rx) = bounded::<Message<MergedDocument>>(self.config.loader_buffer_size);
        let (merge_tx, merge_rx) = bounded::<Message<AlignedGroup>>(self.config.merger_buffer_size);
        let parse_queues: Vec<_> = sources
            .iter()
            .map(|_| bounded::<Message<VariantRecord>>(self.config.parser_buffer_size))
            .collect();

        let mut loaders = Vec::with_capacity(loader_workers);
        for n in 0..loader_workers {
            let worker = LoadWorker {
                store: Arc::clone(&self.store),
                collection: self.collection.clone(),
                mode: self.mode,
                chunk_size: self.config.chunk_size,
                tokens: merger_workers,
                rx: load_rx.clone(),
                counter: Arc::clone(&counter),
                finished: Arc::clone(&finished_loaders),
                errors: sink(3),
            };
            loaders.push(spawn(format!("loader-{}", n), &fatal, move || worker.run())?);
        }
        drop(load_rx);

        let mut workers = Vec::new();
        let counts = Arc::new(sample_counts);
        for n in 0..merger_workers {
            let worker = MergeWorker {
                rx: merge_rx.clone(),
                tx: load_tx.clone(),
                sample_counts: Arc::clone(&counts),
                tokens: loader_workers,
                drop_bad_records: self.config.drop_bad_records,
                dropped: dropped_tx.clone(),
                errors: sink(2),
            };
            workers.push(spawn(format!("merger-{}", n), &fatal, move || worker.run())?);
        }
        drop(merge_rx);
        drop(dropped_tx);

        let parse_rxs: Vec<_> = parse_queues.iter().map(|(_, rx)| rx.clone()).collect();
        {
            let tx = merge_tx.clone();
            let errors = sink(1);
            workers.push(spawn("aligner".to_string(), &fatal, move || {
                align_worker(parse_rxs, tx, merger_workers, errors)
            })?);
        }

        let mut parse_txs = Vec::with_capacity(parse_queues.len());
        for (n, (source, (tx, rx))) in sources.into_iter().zip(parse_queues).enumerate() {
            drop(rx);
            let worker_tx = tx.clone();
            let errors = sink(0);
            workers.push(spawn(format!("parser-{}", n), &fatal, move || {
                parse_worker(n, source, worker_tx, errors)
            })?);
            parse_txs.push(tx);
        }
        drop(error_txs);

        let progress = if self.config.show_progress {
            let spinner = ProgressBar::new_spinner();
            if let Ok(style) = ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed}] {pos} documents ({per_sec}) {msg}")
            {
                spinner.set_style(style.tick_strings(&["-", "\\", "|", "/"]));
            }
            spinner
        } else {
            ProgressBar::hidden()
        };

        let mut dropped = Vec::new();
        let mut aborted = false;
        while loaders.iter().any(|h| !h.is_finished()) {
            thread::sleep(POLL_INTERVAL);
            drain_dropped(&dropped_rx, &mut dropped);
            if fatal.load(Ordering::SeqCst) {
                aborted = true;
                warn!("Import into `{}` aborted, waiting for workers", self.collection);
                progress.set_message("aborting");
                break;
            }
            let parser_depth: usize = parse_txs.iter().map(Sender::len).sum();
            progress.set_position(counter.total());
            progress.set_message(format!(
                "queues {} | {} | {}",
                parser_depth,
                merge_tx.len(),
                load_tx.len()
            ));
        }
        drop(parse_txs);
        drop(merge_tx);
        drop(load_tx);

        for handle in workers.into_iter().chain(loaders) {
            if handle.join().is_err() {
                aborted = true;
            }
        }
        aborted |= fatal.load(Ordering::SeqCst);
        aborted |= finished_loaders.total() != loader_workers as u64;
        drain_dropped(&dropped_rx, &mut dropped);
        progress.finish_and_clear();

        let mut errors: Vec<StageError> = Vec::new();
        for rx in &error_rxs {
            errors.extend(rx.try_iter());
        }

        let report = PipelineReport {
            imported: counter.total(),
            elapsed: start.elapsed(),
            dropped,
            errors,
            aborted,
        };
        info!(
            "Wrote {} documents to `{}` in {:.1}s",
            report.imported,
            self.collection,
            report.elapsed.as_secs_f64()
        );
        Ok(report)
    }
}

fn spawn<F>(name: String, fatal: &Arc<AtomicBool>, work: F) -> Result<JoinHandle<()>>
where
    F: FnOnce() + Send + 'static,
{
    let guard = FatalOnPanic(Arc::clone(fatal));
    let handle = thread::Builder::new().name(name).spawn(move || {
        let _guard = guard;
        work();
    })?;
    Ok(handle)
}

fn drain_dropped(rx: &Receiver<DroppedRecord>, dropped: &mut Vec<DroppedRecord>) {
    for record in rx.try_iter() {
        warn!("Dropped {}: {}", record.locus, record.error);
        dropped.push(record);
    }
}

fn parse_worker(
    index: usize,
    source: RecordStream,
    tx: Sender<Message<VariantRecord>>,
    errors: ErrorSink,
) {
    for record in source {
        if errors.aborted() {
            break;
        }
        match record {
            Ok(record) => {
                if tx.send(Message::Data(record)).is_err() {
                    // aligner is gone
                    break;
                }
            }
            Err(e) => {
                errors.fatal(Stage::Parse, e);
                break;
            }
        }
    }
    let _ = tx.send(Message::EndOfStream);
    debug!("Parser {} done", index);
}

fn align_worker(
    sources: Vec<Receiver<Message<VariantRecord>>>,
    tx: Sender<Message<AlignedGroup>>,
    tokens: usize,
    errors: ErrorSink,
) {
    let mut aligner = StreamAligner::new(sources.into_iter().map(ChannelRecords::new));
    let mut groups = 0u64;
    for group in aligner.by_ref() {
        if errors.aborted() {
            break;
        }
        match group {
            Ok(group) => {
                if tx.send(Message::Data(group)).is_err() {
                    break;
                }
                groups += 1;
            }
            Err(e) => {
                errors.fatal(Stage::Align, e);
                break;
            }
        }
    }
    // unblock parsers still waiting on a full queue
    drop(aligner);
    for _ in 0..tokens {
        let _ = tx.send(Message::EndOfStream);
    }
    debug!("Aligner done after {} loci", groups);
}

struct MergeWorker {
    rx: Receiver<Message<AlignedGroup>>,
    tx: Sender<Message<MergedDocument>>,
    sample_counts: Arc<Vec<usize>>,
    tokens: usize,
    drop_bad_records: bool,
    dropped: Sender<DroppedRecord>,
    errors: ErrorSink,
}

impl MergeWorker {
    fn run(self) {
        while let Ok(Message::Data(group)) = self.rx.recv() {
            if self.errors.aborted() {
                break;
            }
            match merge_records(&group, &self.sample_counts) {
                Ok(doc) => {
                    if self.tx.send(Message::Data(doc)).is_err() {
                        break;
                    }
                }
                Err(e) if self.drop_bad_records => {
                    if let Some(locus) = group.locus() {
                        let _ = self.dropped.send(DroppedRecord { locus, error: e });
                    }
                }
                Err(e) => {
                    self.errors.fatal(Stage::Merge, e);
                    break;
                }
            }
        }
        drop(self.rx);
        for _ in 0..self.tokens {
            let _ = self.tx.send(Message::EndOfStream);
        }
    }
}

struct LoadWorker {
    store: Arc<dyn DocumentStore>,
    collection: String,
    mode: LoadMode,
    chunk_size: usize,
    /// End-of-stream tokens to see before stopping.
    tokens: usize,
    rx: Receiver<Message<MergedDocument>>,
    counter: Arc<Counter>,
    finished: Arc<Counter>,
    errors: ErrorSink,
}

impl LoadWorker {
    fn run(self) {
        let mut seen = 0;
        let mut batch = Vec::with_capacity(self.chunk_size);
        let mut failed = false;

        while seen < self.tokens {
            let doc = match self.rx.recv() {
                Ok(Message::Data(doc)) => doc,
                Ok(Message::EndOfStream) => {
                    seen += 1;
                    continue;
                }
                Err(_) => break,
            };
            if !failed && self.errors.aborted() {
                debug!("Discarding {} batched documents after a fatal failure", batch.len());
                batch.clear();
                failed = true;
            }
            if failed {
                // keep draining so upstream never blocks
                continue;
            }
            match write_op(&doc, self.mode) {
                Ok(op) => batch.push(op),
                Err(e) => {
                    failed = true;
                    self.errors.fatal(Stage::Load, e);
                    continue;
                }
            }
            if batch.len() >= self.chunk_size && !self.flush(&mut batch) {
                failed = true;
            }
        }

        if !failed && self.errors.aborted() {
            failed = true;
        }
        if !failed && !batch.is_empty() && !self.flush(&mut batch) {
            failed = true;
        }
        if !failed {
            self.finished.increment();
        }
    }

    fn flush(&self, batch: &mut Vec<WriteOp>) -> bool {
        let ops = std::mem::replace(batch, Vec::with_capacity(self.chunk_size));
        let size = ops.len();
        match self.store.bulk_write(&self.collection, ops, true) {
            Ok(written) => {
                self.counter.add(written as u64);
                debug!("Flushed {} of {} documents", written, size);
                true
            }
            Err(e) => {
                self.errors.fatal(Stage::Load, e);
                false
            }
        }
    }
}

///
/// The bulk-write element for one merged document.
///
/// In append mode a document created by the upsert is first seeded with the
/// locus and one `null` per old file and per old sample, so new values land
/// in the slots of the new files.
///
pub fn write_op(doc: &MergedDocument, mode: LoadMode) -> Result<WriteOp> {
    let mut document = doc.to_document()?;
    let LoadMode::Append {
        old_files,
        old_samples,
    } = mode
    else {
        return Ok(WriteOp::Insert { document });
    };

    let mut update = Update::new()
        .set_on_insert(FIELD_CHROM, doc.chrom.clone())
        .set_on_insert(FIELD_POS, doc.pos)
        .set_on_insert(FIELD_REF, doc.reference.clone());
    for (field, leading) in PER_FILE_FIELDS
        .iter()
        .map(|f| (*f, old_files))
        .chain([(FIELD_SAMPLES, old_samples)])
    {
        let values = match document.remove(field) {
            Some(Value::Array(values)) => values,
            other => {
                return Err(VcfdbError::Merge(format!(
                    "{}: field {} is not an array: {:?}",
                    doc.id, field, other
                )));
            }
        };
        update = update
            .set_on_insert(field, vec![Value::Null; leading])
            .push(field, values);
    }

    Ok(WriteOp::Upsert {
        id: doc.id.clone(),
        update,
    })
}
