// ------------------------------------------------------------------------------------------------
// Copyright © 2021, stack-graphs authors.
// Licensed under either of Apache License, Version 2.0, or MIT license, at your option.
// Please see the LICENSE-APACHE or LICENSE-MIT files in this distribution for license details.
// ------------------------------------------------------------------------------------------------

//! Repository configuration (spec.md §6's "Configuration" section).

use std::num::NonZeroUsize;
use std::path::PathBuf;

/// The recognized configuration options of spec.md §6. `parser_map` is not represented here as
/// data — it is built programmatically via [`crate::parser::ParserRegistry`] and passed to
/// [`crate::repository::Repository::new`] separately, since a `Language → Parser` table cannot be
/// meaningfully deserialized (a `Parser` is a trait object, not data).
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug)]
pub struct RepositoryConfig {
    /// Path to the snapshot file: loaded on construction if present, saved on teardown.
    pub snapshot_path: Option<PathBuf>,
    /// Merge-pipeline worker count. Defaults to [`std::thread::available_parallelism`].
    pub parallelism: usize,
    /// Whether the global scope lock supports recursive shared acquisition.
    pub lock_recursion: bool,
    /// Scan interval, in seconds, for the collaborator directory watcher (out of scope for this
    /// crate beyond the [`crate::pipeline::ScanGate`] it is expected to drive).
    pub scan_interval_seconds: f64,
}

impl Default for RepositoryConfig {
    fn default() -> RepositoryConfig {
        RepositoryConfig {
            snapshot_path: None,
            parallelism: default_parallelism(),
            lock_recursion: true,
            scan_interval_seconds: 60.0,
        }
    }
}

fn default_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}
