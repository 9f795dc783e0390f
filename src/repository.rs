// ------------------------------------------------------------------------------------------------
// Copyright © 2021, stack-graphs authors.
// Licensed under either of Apache License, Version 2.0, or MIT license, at your option.
// Please see the LICENSE-APACHE or LICENSE-MIT files in this distribution for license details.
// ------------------------------------------------------------------------------------------------

//! The repository facade (C9): wires the scope graph (C1), merge algebra (C2), name resolution
//! (C3), parser registry (C4), ingest pipeline (C5), query surface (C7), and lock (C8) together
//! behind one entry point, plus the readiness signal and event subscription lifecycle of spec.md
//! §4.5/§6.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::Receiver;
use tracing::{error, info};

use crate::arena::Handle;
use crate::config::RepositoryConfig;
use crate::error::{RepositoryError, Result, SnapshotAction};
use crate::event::{EventBus, FileEvent, FileEventKind, RepositoryEvent};
use crate::graph::{Language, MethodCall, NamedEntity, Scope, ScopeGraph, ScopeKindFilter};
use crate::lock::ScopeLock;
use crate::parser::{FileUnit, ParserRegistry};
use crate::pipeline::IngestPipeline;
use crate::{query, resolve};

/// The incremental program-fact repository: the public surface a caller (a CLI, an editor
/// integration, a batch indexer) drives.
pub struct Repository {
    lock: Arc<ScopeLock>,
    parsers: Arc<ParserRegistry>,
    events: Arc<EventBus>,
    pipeline: IngestPipeline,
    config: RepositoryConfig,
}

impl Repository {
    /// Constructs a repository from `config`. If `config.snapshot_path` is set and the file
    /// exists, it is loaded; on any deserialization failure, the failure is reported via
    /// [`RepositoryEvent::ErrorRaised`] and the repository falls back to an empty graph (the
    /// caller then drives a full reparse through [`Repository::bulk_ingest`], per spec.md §4.5's
    /// "Bulk initialization").
    pub fn new(config: RepositoryConfig, parsers: ParserRegistry) -> Repository {
        let graph = Self::load_initial_graph(&config);
        let lock = Arc::new(ScopeLock::new(graph, config.lock_recursion));
        let parsers = Arc::new(parsers);
        let events = Arc::new(EventBus::new());
        let pipeline = IngestPipeline::start(
            Arc::clone(&lock),
            Arc::clone(&parsers),
            Arc::clone(&events),
            config.parallelism,
        );
        Repository {
            lock,
            parsers,
            events,
            pipeline,
            config,
        }
    }

    #[cfg(feature = "bincode-snapshot")]
    fn load_initial_graph(config: &RepositoryConfig) -> ScopeGraph {
        let Some(path) = &config.snapshot_path else {
            return ScopeGraph::new();
        };
        if !path.exists() {
            return ScopeGraph::new();
        }
        match crate::snapshot::load(path) {
            Ok(graph) => {
                info!(path = %path.display(), "loaded snapshot");
                graph
            }
            Err(err) => {
                error!(path = %path.display(), error = %err, "snapshot load failed, falling back to full reparse");
                ScopeGraph::new()
            }
        }
    }

    #[cfg(not(feature = "bincode-snapshot"))]
    fn load_initial_graph(_config: &RepositoryConfig) -> ScopeGraph {
        ScopeGraph::new()
    }

    /// Runs spec.md §4.5's bulk reparse: hands every unit in `units` to the producer pool as an
    /// `Added` event and returns once all of them have actually been merged (not merely
    /// enqueued). Used at startup when no snapshot was loaded.
    pub fn bulk_ingest(&self, units: Vec<FileUnit>) {
        self.pipeline.bulk_reparse(units);
    }

    /// Submits a single [`FileEvent`] for processing, per spec.md §4.5's dispatch table. `unit` is
    /// the file's current content and is required for everything but `Deleted`. Returns once the
    /// event has been accepted by the pipeline; the parse/merge itself completes asynchronously —
    /// watch `is_ready()`/[`Repository::subscribe`]'s `IsReadyChanged` to know when.
    pub fn handle_event(&self, event: FileEvent, unit: Option<FileUnit>) {
        self.pipeline.submit(event, unit);
    }

    /// Whether an ingest/merge is currently in progress (spec.md §4.5's `IsReady`). Reflects
    /// actual completion of every submitted job, not just whether it has been handed off.
    pub fn is_ready(&self) -> bool {
        self.pipeline.is_ready()
    }

    /// Installs an event subscriber; drop the returned receiver to unsubscribe.
    pub fn subscribe(&self) -> Receiver<RepositoryEvent> {
        self.events.subscribe(64)
    }

    /// `FindScope(loc|xpath|element)`.
    pub fn find_scope(&self, file: &Path, xpath: &str) -> Option<Handle<Scope>> {
        let graph = self.lock.read();
        query::find_scope(&graph, file, xpath)
    }

    /// `FindScope<K>(...)`.
    pub fn find_scope_of_kind(
        &self,
        file: &Path,
        xpath: &str,
        filter: ScopeKindFilter,
    ) -> Option<Handle<Scope>> {
        let graph = self.lock.read();
        query::find_scope_of_kind(&graph, file, xpath, filter)
    }

    /// `FindMethodCalls(loc|xpath|element)`.
    pub fn find_method_calls(&self, file: &Path, xpath: &str) -> Vec<Handle<MethodCall>> {
        let graph = self.lock.read();
        query::find_method_calls(&graph, file, xpath)
    }

    /// `FindMatches(nameUse)`. The caller supplies the `NameUse`'s enclosing scope and statement,
    /// as every caller that has reached a `NameUse` handle has already navigated down from a
    /// scope in the first place (see [`crate::resolve`]'s module doc).
    pub fn find_matches(
        &self,
        name_use: Handle<crate::graph::Expression>,
        scope: Handle<Scope>,
        statement: Option<Handle<crate::graph::Statement>>,
    ) -> Result<Vec<NamedEntity>> {
        let graph = self.lock.read();
        resolve::find_matches(&graph, name_use, scope, statement)
    }

    /// Bounded-wait shared acquisition of the global scope, per spec.md §5's
    /// `TryLockGlobalScope(timeout)`. Exposed for callers that need to run several query
    /// primitives against one consistent snapshot without tripping over a concurrent mutation
    /// mid-sequence.
    pub fn try_read_for(&self, timeout: Duration) -> Option<parking_lot::RwLockReadGuard<'_, ScopeGraph>> {
        self.lock.try_read_for(timeout)
    }

    /// Runs `f` against a consistent read-locked snapshot of the global scope.
    pub fn with_graph<T>(&self, f: impl FnOnce(&ScopeGraph) -> T) -> T {
        let graph = self.lock.read();
        f(&graph)
    }

    /// Discards the entire graph and re-initializes to empty. Per spec.md §7, the caller must do
    /// this after a `FatalInternalError` before the repository is usable again.
    pub fn clear(&self) {
        let mut graph = self.lock.write();
        *graph = ScopeGraph::new();
    }

    pub fn config(&self) -> &RepositoryConfig {
        &self.config
    }

    pub fn parsers(&self) -> &Arc<ParserRegistry> {
        &self.parsers
    }

    /// Saves the current graph to `path` under a read lock, per spec.md §4.6.
    #[cfg(feature = "bincode-snapshot")]
    pub fn save_snapshot(&self, path: &Path) -> Result<()> {
        let graph = self.lock.read();
        crate::snapshot::save(&graph, path).map_err(|source| RepositoryError::Serialization {
            action: SnapshotAction::Save,
            source,
        })
    }

    /// Loads `path` and installs it as the current graph under a write lock, per spec.md §4.6.
    #[cfg(feature = "bincode-snapshot")]
    pub fn load_snapshot(&self, path: &Path) -> Result<()> {
        let loaded = crate::snapshot::load(path).map_err(|source| RepositoryError::Serialization {
            action: SnapshotAction::Load,
            source,
        })?;
        let mut graph = self.lock.write();
        *graph = loaded;
        Ok(())
    }

    /// Saves to `config.snapshot_path`, if one is configured. Called on teardown
    /// ([`Drop`]) to honor spec.md §6's "save on dispose".
    #[cfg(feature = "bincode-snapshot")]
    fn save_configured_snapshot(&self) {
        if let Some(path) = self.config.snapshot_path.clone() {
            if let Err(err) = self.save_snapshot(&path) {
                error!(path = %path.display(), error = %err, "failed to save snapshot on teardown");
            }
        }
    }

    #[cfg(not(feature = "bincode-snapshot"))]
    fn save_configured_snapshot(&self) {}
}

impl Drop for Repository {
    fn drop(&mut self) {
        self.save_configured_snapshot();
    }
}

/// Helper for constructing an `Added` event plus its [`FileUnit`] together, since the two always
/// travel as a pair through [`Repository::handle_event`].
pub fn added_unit(path: impl Into<PathBuf>, language: Language, xml: impl Into<String>) -> (FileEvent, FileUnit) {
    let path = path.into();
    (FileEvent::added(path.clone()), FileUnit::new(path, language, xml))
}
