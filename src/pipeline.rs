// ------------------------------------------------------------------------------------------------
// Copyright © 2021, stack-graphs authors.
// Licensed under either of Apache License, Version 2.0, or MIT license, at your option.
// Please see the LICENSE-APACHE or LICENSE-MIT files in this distribution for license details.
// ------------------------------------------------------------------------------------------------

//! The ingest/update pipeline (C5): event dispatch, parallel parse, serialized merge (spec.md
//! §4.5, §5).
//!
//! [`IngestPipeline`] owns a producer thread pool that parses file units concurrently and a
//! single merge thread that drains the parsed trees and folds them into the global scope one at a
//! time, holding the write lock for the duration of each merge. Bulk initialization (parsing many
//! files at once, e.g. at startup after a failed snapshot load) and steady-state single-file
//! [`FileEvent`] handling share the same producer/merge machinery.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{bounded, Sender};
use tracing::{info_span, warn};

use crate::error::RepositoryError;
use crate::event::{EventBus, FileEvent, FileEventKind, RepositoryEvent};
use crate::graph::Language;
use crate::lock::ScopeLock;
use crate::merge;
use crate::parser::{FileUnit, ParserRegistry};

/// One file unit handed to the producer pool, paired with the event that requested it (so the
/// merge thread can report completion with the right [`FileEventKind`]).
struct ParseJob {
    kind: FileEventKind,
    unit: FileUnit,
}

/// A tree that parsed successfully, queued for the single merge thread. Carries the job's
/// metadata through so `FileProcessed` can be raised once merge completes.
struct ParsedTree {
    kind: FileEventKind,
    path: PathBuf,
    language: Language,
    tree: crate::graph::ScopeGraph,
}

/// Tracks how many submitted jobs (parse-then-merge, or a synchronous removal) have not yet
/// completed, and derives spec.md §4.5's `IsReady` from it: ready transitions to `false` the
/// moment the in-flight count leaves zero, and back to `true` only once it returns to zero — an
/// edge-triggered signal published as `IsReadyChanged`, not a synchronous echo of "was this one
/// call's enqueue step submitted", which is what merely bracketing `submit()` would give you.
struct Readiness {
    inflight: AtomicUsize,
    ready: AtomicBool,
}

impl Readiness {
    fn new() -> Readiness {
        Readiness {
            inflight: AtomicUsize::new(0),
            ready: AtomicBool::new(true),
        }
    }

    fn begin(&self, events: &EventBus) {
        if self.inflight.fetch_add(1, Ordering::SeqCst) == 0 && self.ready.swap(false, Ordering::SeqCst) {
            events.publish(RepositoryEvent::IsReadyChanged(false));
        }
    }

    fn end(&self, events: &EventBus) {
        if self.inflight.fetch_sub(1, Ordering::SeqCst) == 1 && !self.ready.swap(true, Ordering::SeqCst) {
            events.publish(RepositoryEvent::IsReadyChanged(true));
        }
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }
}

/// Drives file units from [`FileEvent`]s through [`crate::parser::Parser::parse_file_unit`]
/// (in parallel, on a producer pool) and then through [`crate::merge::merge_file`] /
/// [`crate::merge::remove_file`] (serialized, on a single merge thread), per spec.md §4.5's
/// dispatch table:
///
/// | Event    | Action                                    |
/// |----------|-------------------------------------------|
/// | Added    | parse `path`; merge result into global    |
/// | Changed  | `RemoveFile(path)`; then as Added         |
/// | Deleted  | `RemoveFile(path)`                        |
/// | Renamed  | `RemoveFile(oldPath)`; then as Added on `path` |
pub struct IngestPipeline {
    lock: Arc<ScopeLock>,
    parsers: Arc<ParserRegistry>,
    events: Arc<EventBus>,
    job_tx: Sender<ParseJob>,
    readiness: Arc<Readiness>,
    _producers: Vec<thread::JoinHandle<()>>,
    _merger: Option<thread::JoinHandle<()>>,
}

impl IngestPipeline {
    /// Starts `parallelism` producer threads and one merge thread. The merge queue is bounded at
    /// `2 * parallelism` entries: enough to keep producers from stalling on a slow merge batch
    /// without letting an unbounded backlog of parsed trees accumulate in memory (spec.md §4.5's
    /// "bounded merge queue").
    pub fn start(
        lock: Arc<ScopeLock>,
        parsers: Arc<ParserRegistry>,
        events: Arc<EventBus>,
        parallelism: usize,
    ) -> IngestPipeline {
        let parallelism = parallelism.max(1);
        let (job_tx, job_rx) = bounded::<ParseJob>(parallelism * 2);
        let (tree_tx, tree_rx) = bounded::<ParsedTree>(parallelism * 2);

        let readiness = Arc::new(Readiness::new());

        let mut producers = Vec::with_capacity(parallelism);
        for worker_id in 0..parallelism {
            let job_rx = job_rx.clone();
            let tree_tx = tree_tx.clone();
            let parsers = Arc::clone(&parsers);
            let events = Arc::clone(&events);
            let readiness = Arc::clone(&readiness);
            producers.push(
                thread::Builder::new()
                    .name(format!("progfact-parse-{worker_id}"))
                    .spawn(move || producer_loop(job_rx, tree_tx, parsers, events, readiness))
                    .expect("failed to spawn parser worker thread"),
            );
        }
        drop(tree_tx);

        let merger = {
            let lock = Arc::clone(&lock);
            let events = Arc::clone(&events);
            let readiness = Arc::clone(&readiness);
            thread::Builder::new()
                .name("progfact-merge".to_string())
                .spawn(move || merge_loop(tree_rx, lock, events, readiness))
                .expect("failed to spawn merge thread")
        };

        IngestPipeline {
            lock,
            parsers,
            events,
            job_tx,
            readiness,
            _producers: producers,
            _merger: Some(merger),
        }
    }

    /// Submits `event` for processing. `unit` is the file's content to (re-)parse; it is ignored
    /// for `Deleted` (there is nothing to parse) and required otherwise — callers only have a
    /// `FileUnit` to hand over in the first place once they know the file still exists, which the
    /// `Deleted` case by definition doesn't.
    ///
    /// `Deleted` and the `RemoveFile` half of `Changed`/`Renamed` are applied synchronously under
    /// the write lock (removal is cheap and must complete before any later `Added` half is queued,
    /// so that the two don't race on the same path); the `Added` half is handed to the producer
    /// pool. Either way, `IsReady` flips to `false` for the whole duration of the operation and
    /// back to `true` only once the corresponding parse-and-merge (or removal) has actually
    /// finished — not merely been enqueued — per spec.md §4.5.
    pub fn submit(&self, event: FileEvent, unit: Option<FileUnit>) {
        match event.kind {
            FileEventKind::Deleted => {
                self.readiness.begin(&self.events);
                self.remove_file_now(&event.path);
                self.events.publish(RepositoryEvent::FileProcessed {
                    kind: FileEventKind::Deleted,
                    path: event.path,
                });
                self.readiness.end(&self.events);
            }
            FileEventKind::Changed => {
                self.readiness.begin(&self.events);
                self.remove_file_now(&event.path);
                self.enqueue_parse(FileEventKind::Changed, unit.expect("Changed event needs a FileUnit"));
            }
            FileEventKind::Renamed => {
                let old_path = event.old_path.expect("Renamed event must carry old_path");
                self.readiness.begin(&self.events);
                self.remove_file_now(&old_path);
                self.enqueue_parse(FileEventKind::Renamed, unit.expect("Renamed event needs a FileUnit"));
            }
            FileEventKind::Added => {
                self.readiness.begin(&self.events);
                self.enqueue_parse(FileEventKind::Added, unit.expect("Added event needs a FileUnit"));
            }
        }
    }

    fn remove_file_now(&self, path: &Path) {
        let _span = info_span!("remove_file", path = %path.display()).entered();
        let mut graph = self.lock.write();
        merge::remove_file(&mut graph, path);
    }

    /// Hands a parse job to the producer pool. Assumes the caller has already called
    /// `readiness.begin`; the matching `end` happens once the job's parse fails or its merge
    /// completes (see `producer_loop`/`merge_loop`).
    fn enqueue_parse(&self, kind: FileEventKind, unit: FileUnit) {
        // A full queue means the producer pool is saturated; block rather than drop the event,
        // matching spec.md §5's bounded-queue backpressure (the caller is the one who should see
        // ingest slow down, not lose an update silently).
        if self.job_tx.send(ParseJob { kind, unit }).is_err() {
            self.readiness.end(&self.events);
        }
    }

    /// Runs the full bulk-initialization reparse described in spec.md §4.5: submits `units` as
    /// `Added` events and blocks until the merge thread has drained all of them. Used when no
    /// snapshot is configured, or when loading one failed.
    pub fn bulk_reparse(&self, units: Vec<FileUnit>) {
        for unit in units {
            self.readiness.begin(&self.events);
            self.enqueue_parse(FileEventKind::Added, unit);
        }
        self.wait_until_drained();
    }

    /// Blocks the calling thread until every in-flight job has completed (`IsReady` is `true`).
    fn wait_until_drained(&self) {
        while !self.readiness.is_ready() {
            thread::sleep(Duration::from_millis(1));
        }
    }

    pub fn is_ready(&self) -> bool {
        self.readiness.is_ready()
    }

    pub fn parsers(&self) -> &Arc<ParserRegistry> {
        &self.parsers
    }
}

fn producer_loop(
    job_rx: crossbeam_channel::Receiver<ParseJob>,
    tree_tx: Sender<ParsedTree>,
    parsers: Arc<ParserRegistry>,
    events: Arc<EventBus>,
    readiness: Arc<Readiness>,
) {
    while let Ok(job) = job_rx.recv() {
        let _span = info_span!("parse_file", path = %job.unit.path.display()).entered();
        let Some(parser) = parsers.get(job.unit.language) else {
            events.publish(RepositoryEvent::ErrorRaised(Arc::new(
                RepositoryError::UnknownLanguage(job.unit.language),
            )));
            readiness.end(&events);
            continue;
        };
        match parser.parse_file_unit(&job.unit) {
            Ok(tree) => {
                let sent = tree_tx.send(ParsedTree {
                    kind: job.kind,
                    path: job.unit.path,
                    language: job.unit.language,
                    tree,
                });
                if sent.is_err() {
                    readiness.end(&events);
                    break; // merge thread has shut down
                }
            }
            Err(parse_error) => {
                warn!(path = %job.unit.path.display(), error = %parse_error, "parse failed");
                events.publish(RepositoryEvent::ErrorRaised(Arc::new(RepositoryError::Parse {
                    path: job.unit.path,
                    xpath: parse_error.xpath,
                    message: parse_error.message,
                })));
                readiness.end(&events);
            }
        }
    }
}

fn merge_loop(
    tree_rx: crossbeam_channel::Receiver<ParsedTree>,
    lock: Arc<ScopeLock>,
    events: Arc<EventBus>,
    readiness: Arc<Readiness>,
) {
    for parsed in tree_rx {
        let _span = info_span!("merge_file", path = %parsed.path.display()).entered();
        {
            let mut graph = lock.write();
            merge::merge_file(&mut graph, &parsed.tree, parsed.language);
        }
        events.publish(RepositoryEvent::FileProcessed {
            kind: parsed.kind,
            path: parsed.path,
        });
        readiness.end(&events);
    }
}

//-------------------------------------------------------------------------------------------------
// Scan-timer discipline (spec.md §5)

/// The three-state reentry guard spec.md §5 describes for the collaborator directory watcher: a
/// scan only runs when a tick finds the gate `Idle`; stopping spins until the gate returns to
/// `Idle` before transitioning to `Stopped`, so that a stop never races an in-flight scan. This
/// crate does not implement the watcher itself (spec.md §1's explicit exclusion) — only the gate a
/// `notify`-based watcher would drive.
#[repr(u8)]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ScanState {
    Stopped = 0,
    Idle = 1,
    Running = 2,
}

impl ScanState {
    fn from_u8(value: u8) -> ScanState {
        match value {
            0 => ScanState::Stopped,
            1 => ScanState::Idle,
            _ => ScanState::Running,
        }
    }
}

pub struct ScanGate {
    state: AtomicU8,
}

impl Default for ScanGate {
    fn default() -> ScanGate {
        ScanGate {
            state: AtomicU8::new(ScanState::Idle as u8),
        }
    }
}

impl ScanGate {
    pub fn new() -> ScanGate {
        ScanGate::default()
    }

    pub fn state(&self) -> ScanState {
        ScanState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Attempts to transition `Idle -> Running`. Returns `true` if this call won the race (the
    /// caller should run its scan now and call [`finish_scan`][Self::finish_scan] afterward).
    pub fn try_begin_scan(&self) -> bool {
        self.state
            .compare_exchange(
                ScanState::Idle as u8,
                ScanState::Running as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_ok()
    }

    /// Transitions `Running -> Idle`. Only the thread that won [`try_begin_scan`][Self::try_begin_scan]
    /// should call this.
    pub fn finish_scan(&self) {
        self.state.store(ScanState::Idle as u8, Ordering::SeqCst);
    }

    /// Spins until the gate is `Idle` (no scan in flight), then transitions it to `Stopped`. Once
    /// stopped, [`try_begin_scan`][Self::try_begin_scan] always fails.
    pub fn stop(&self) {
        loop {
            if self
                .state
                .compare_exchange(
                    ScanState::Idle as u8,
                    ScanState::Stopped as u8,
                    Ordering::SeqCst,
                    Ordering::SeqCst,
                )
                .is_ok()
            {
                return;
            }
            thread::yield_now();
        }
    }
}
