// ------------------------------------------------------------------------------------------------
// Copyright © 2021, stack-graphs authors.
// Licensed under either of Apache License, Version 2.0, or MIT license, at your option.
// Please see the LICENSE-APACHE or LICENSE-MIT files in this distribution for license details.
// ------------------------------------------------------------------------------------------------

//! The error taxonomy of spec.md §7, as a `thiserror`-derived enum.
//!
//! Per-file errors ([`RepositoryError::Parse`], [`RepositoryError::UnknownLanguage`]) and snapshot
//! load failures ([`RepositoryError::Serialization`]) are *recovered* by the pipeline: they are
//! turned into an [`crate::event::RepositoryEvent::ErrorRaised`] and never propagate to a caller.
//! [`RepositoryError::Resolution`], [`RepositoryError::Argument`], and
//! [`RepositoryError::FatalInternal`] are surfaced directly.

use std::path::PathBuf;

use thiserror::Error;

/// The six-entry error taxonomy of spec.md §7.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Syntactic lowering failed on a single file unit. Recovered: the file contributes nothing.
    #[error("failed to parse {path}: {message} (at {xpath})")]
    Parse {
        path: PathBuf,
        xpath: String,
        message: String,
    },

    /// Snapshot load or save failed.
    #[error("snapshot {action} failed: {source}")]
    Serialization {
        action: SnapshotAction,
        #[source]
        source: SnapshotError,
    },

    /// `FindMatches` was invoked on a `NameUse` with no parent statement.
    #[error("cannot resolve a name use with no parent statement")]
    Resolution,

    /// A public query received a null/invalid input.
    #[error("invalid argument: {0}")]
    Argument(String),

    /// A file unit's language has no registered parser.
    #[error("no parser registered for language {0:?}")]
    UnknownLanguage(crate::graph::Language),

    /// A graph invariant was violated (e.g. a cycle was detected during merge). Surfaced; the
    /// repository transitions to unready and the caller must `Clear` and reinitialize.
    #[error("internal invariant violated: {0}")]
    FatalInternal(String),
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum SnapshotAction {
    Save,
    Load,
}

impl std::fmt::Display for SnapshotAction {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(match self {
            SnapshotAction::Save => "save",
            SnapshotAction::Load => "load",
        })
    }
}

/// Errors specific to [`crate::snapshot`]'s binary format.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("bad magic bytes in snapshot file")]
    BadMagic,
    #[error("unsupported snapshot format version {found} (expected {expected})")]
    VersionMismatch { found: u32, expected: u32 },
    #[cfg(feature = "serde")]
    #[error("decode error: {0}")]
    Decode(String),
    #[cfg(feature = "serde")]
    #[error("encode error: {0}")]
    Encode(String),
}

pub type Result<T> = std::result::Result<T, RepositoryError>;
