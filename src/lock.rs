// ------------------------------------------------------------------------------------------------
// Copyright © 2021, stack-graphs authors.
// Licensed under either of Apache License, Version 2.0, or MIT license, at your option.
// Please see the LICENSE-APACHE or LICENSE-MIT files in this distribution for license details.
// ------------------------------------------------------------------------------------------------

//! The shared-exclusive recursive lock (C8) that protects the global scope graph.
//!
//! One lock per repository. Reads (queries, and `FindMatches` calling back into another query
//! helper from within the same reader) take it shared; mutations (Add/Remove/Merge/Clear/Load)
//! take it exclusive. No other lock is ever acquired while holding this one.

use std::time::Duration;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::graph::ScopeGraph;

/// Wraps a [`parking_lot::RwLock`] over the global [`ScopeGraph`]. When `recursive` is set (the
/// default, matching spec.md §6's `lockRecursion` default of `true`), reads are taken with
/// `read_recursive`, so a query helper may call another query helper without deadlocking a writer
/// waiting behind it.
pub struct ScopeLock {
    graph: RwLock<ScopeGraph>,
    recursive: bool,
}

impl ScopeLock {
    pub fn new(graph: ScopeGraph, recursive: bool) -> ScopeLock {
        ScopeLock {
            graph: RwLock::new(graph),
            recursive,
        }
    }

    /// Blocking shared acquisition.
    pub fn read(&self) -> RwLockReadGuard<'_, ScopeGraph> {
        if self.recursive {
            self.graph.read_recursive()
        } else {
            self.graph.read()
        }
    }

    /// Blocking exclusive acquisition.
    pub fn write(&self) -> RwLockWriteGuard<'_, ScopeGraph> {
        self.graph.write()
    }

    /// `TryLockGlobalScope(timeout)`'s shared form: bounded-wait acquisition that returns `None`
    /// on timeout rather than blocking forever.
    pub fn try_read_for(&self, timeout: Duration) -> Option<RwLockReadGuard<'_, ScopeGraph>> {
        if self.recursive {
            self.graph.try_read_recursive_for(timeout)
        } else {
            self.graph.try_read_for(timeout)
        }
    }

    /// `TryLockGlobalScope(timeout)`'s exclusive form.
    pub fn try_write_for(&self, timeout: Duration) -> Option<RwLockWriteGuard<'_, ScopeGraph>> {
        self.graph.try_write_for(timeout)
    }
}
