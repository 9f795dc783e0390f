// -*- coding: utf-8 -*-
// ------------------------------------------------------------------------------------------------
// Copyright © 2021, stack-graphs authors.
// Licensed under either of Apache License, Version 2.0, or MIT license, at your option.
// Please see the LICENSE-APACHE or LICENSE-MIT files in this distribution for license details.
// ------------------------------------------------------------------------------------------------

//! A persistent, incrementally updating program-fact repository over a language-independent
//! **scope graph**.
//!
//! The repository ingests per-file syntactic XML ("file units" — an external, syntactic markup of
//! C, C++, Java, and C# source), lowers each into a uniform scope tree of declarations,
//! expressions, and usages via a pluggable [`parser::Parser`], and folds successive file trees
//! into one global scope graph via the [`merge`] algebra. Callers query the result with two kinds
//! of question: "what scope contains this location?" ([`query`]) and "which declarations could
//! this name refer to?" ([`resolve`]).
//!
//! ## Relationship to scope graphs
//!
//! The data model here is the plain, un-stacked [scope graphs][] formalism: a tree of named and
//! lexical scopes, with name resolution performed by walking the tree directly (lexical ancestry,
//! qualified-name chaining, import/alias substitution) rather than by compiling bindings into a
//! separate path-finding automaton. There is no cross-file binding edge to maintain incrementally
//! beyond the tree's own structure — incrementality instead falls out of the [`merge`] algebra
//! being commutative, associative, and invertible on a per-file basis (see `merge`'s module doc
//! and spec.md §8's algebraic laws): adding or removing one file's contribution never requires
//! revisiting any other file's.
//!
//! [scope graphs]: https://pl.ewi.tudelft.nl/research/projects/scope-graphs/
//!
//! ## Module map
//!
//! - [`arena`] / [`location`] / [`graph`]: the scope graph data model (scopes, statements,
//!   expressions, declarations, method calls) and the arena allocator it's built from.
//! - [`merge`]: folds a freshly parsed file tree into the global graph, and strips one back out.
//! - [`resolve`]: `FindMatches` — lexical, qualified-name, and import/alias-aware name resolution.
//! - [`parser`]: the `Language`-keyed parser plug-in contract.
//! - [`pipeline`]: concurrent parse, serialized merge, and the scan-timer reentry guard.
//! - [`lock`]: the shared-exclusive recursive lock protecting the global scope.
//! - [`snapshot`]: whole-graph binary serialization (requires the `bincode-snapshot` feature).
//! - [`query`]: location-based lookups (`FindScope`, `FindMethodCalls`).
//! - [`config`] / [`event`]: configuration and the events the repository consumes/emits.
//! - [`error`]: the repository's error taxonomy.
//! - [`repository`]: the facade tying all of the above together.

pub mod arena;
pub mod config;
pub mod error;
pub mod event;
pub mod graph;
pub mod location;
pub mod lock;
pub mod merge;
pub mod parser;
pub mod pipeline;
pub mod query;
pub mod repository;
pub mod resolve;
#[cfg(feature = "bincode-snapshot")]
pub mod snapshot;

pub use error::{RepositoryError, Result};
pub use repository::Repository;
