// ------------------------------------------------------------------------------------------------
// Copyright © 2021, stack-graphs authors.
// Licensed under either of Apache License, Version 2.0, or MIT license, at your option.
// Please see the LICENSE-APACHE or LICENSE-MIT files in this distribution for license details.
// ------------------------------------------------------------------------------------------------

//! Snapshot I/O (C6): whole-graph serialize/deserialize with a version check (spec.md §4.6).
//!
//! The on-disk format is a small versioned envelope — magic bytes, a `u32` format version, then a
//! `bincode`-encoded [`ScopeGraph`] — matching the teacher's `storage` module's choice of codec
//! while dropping its SQLite backing store: spec.md §4.6 calls for a single whole-image file, not
//! a queryable per-file database, so a flat envelope is the closer fit (documented in DESIGN.md).
//!
//! `save`/`load` themselves do not take any lock; callers are expected to hold the
//! [`crate::lock::ScopeLock`] appropriately (shared for `save`, exclusive for `load`), per spec.md
//! §4.6's "writers must serialize a consistent snapshot" and §5's locking discipline.

use std::fs;
use std::io::Write;
use std::path::Path;

use crate::error::SnapshotError;
use crate::graph::ScopeGraph;

const MAGIC: &[u8; 8] = b"PFREPO01";
const FORMAT_VERSION: u32 = 1;

const BINCODE_CONFIG: bincode::config::Configuration = bincode::config::standard();

/// Writes `graph` to `path` as a versioned, self-describing binary image. Does not make the write
/// atomic against a crash mid-write; per spec.md §4.6, atomicity (temp file + rename) is the
/// caller's responsibility.
pub fn save(graph: &ScopeGraph, path: &Path) -> Result<(), SnapshotError> {
    let payload = bincode::serde::encode_to_vec(graph, BINCODE_CONFIG)
        .map_err(|e| SnapshotError::Encode(e.to_string()))?;
    let mut file = fs::File::create(path)?;
    file.write_all(MAGIC)?;
    file.write_all(&FORMAT_VERSION.to_le_bytes())?;
    file.write_all(&payload)?;
    file.sync_all()?;
    Ok(())
}

/// Reads a snapshot previously written by [`save`], failing loudly on a magic-byte or
/// version mismatch rather than attempting to interpret an incompatible image.
pub fn load(path: &Path) -> Result<ScopeGraph, SnapshotError> {
    let bytes = fs::read(path)?;
    if bytes.len() < MAGIC.len() + 4 {
        return Err(SnapshotError::BadMagic);
    }
    let (magic, rest) = bytes.split_at(MAGIC.len());
    if magic != MAGIC {
        return Err(SnapshotError::BadMagic);
    }
    let (version_bytes, payload) = rest.split_at(4);
    let version = u32::from_le_bytes(version_bytes.try_into().expect("4 bytes"));
    if version != FORMAT_VERSION {
        return Err(SnapshotError::VersionMismatch {
            found: version,
            expected: FORMAT_VERSION,
        });
    }
    let (graph, _) = bincode::serde::decode_from_slice(payload, BINCODE_CONFIG)
        .map_err(|e| SnapshotError::Decode(e.to_string()))?;
    Ok(graph)
}
