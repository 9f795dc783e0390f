// ------------------------------------------------------------------------------------------------
// Copyright © 2021, stack-graphs authors.
// Licensed under either of Apache License, Version 2.0, or MIT license, at your option.
// Please see the LICENSE-APACHE or LICENSE-MIT files in this distribution for license details.
// ------------------------------------------------------------------------------------------------

//! Source locations.
//!
//! Every node in the scope graph carries one or more [`Location`]s, which are its primary
//! identity for de-duplication (invariant #2 and #4 of the scope graph). A location is a tuple of
//! `(file, xpath, start line, start column, length)`; it orders by file path, then start line,
//! then start column, matching `lsp_positions::Span`'s ordering contract in spirit.

use std::cmp::Ordering;
use std::path::PathBuf;

/// A single location within a file unit: the file it came from, the XPath into that file's
/// syntactic XML, and a line/column/length span.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Location {
    pub file: PathBuf,
    pub xpath: String,
    pub start_line: u32,
    pub start_column: u32,
    pub length: u32,
}

impl Location {
    pub fn new(
        file: impl Into<PathBuf>,
        xpath: impl Into<String>,
        start_line: u32,
        start_column: u32,
        length: u32,
    ) -> Location {
        Location {
            file: file.into(),
            xpath: xpath.into(),
            start_line,
            start_column,
            length,
        }
    }

    /// The sort key used everywhere the spec calls for "file path lexicographic, then
    /// line/column": invariant #2 (primary location is the lexically smallest) and invariant #4
    /// (cross-file child interleaving).
    fn sort_key(&self) -> (&std::path::Path, u32, u32) {
        (self.file.as_path(), self.start_line, self.start_column)
    }
}

impl Ord for Location {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key()
            .cmp(&other.sort_key())
            .then_with(|| self.length.cmp(&other.length))
            .then_with(|| self.xpath.cmp(&other.xpath))
    }
}

impl PartialOrd for Location {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Returns the lexically smallest of a non-empty slice of locations, per invariant #2.
pub fn primary_location(locations: &[Location]) -> Option<&Location> {
    locations.iter().min()
}
