// ------------------------------------------------------------------------------------------------
// Copyright © 2021, stack-graphs authors.
// Licensed under either of Apache License, Version 2.0, or MIT license, at your option.
// Please see the LICENSE-APACHE or LICENSE-MIT files in this distribution for license details.
// ------------------------------------------------------------------------------------------------

//! The query surface (C7): location-based lookups over a [`ScopeGraph`].
//!
//! Only the correctly-cased `find_scope`/`find_scope_of_kind`/`find_method_calls` are exposed,
//! deliberately omitting the source's lowercase-`s` `Findscope<T>` (Open Question #4).

use std::path::Path;

use itertools::Itertools;

use crate::arena::Handle;
use crate::graph::{MethodCall, Scope, ScopeGraph, ScopeKindFilter};

/// `FindScope(loc|xpath|element)`: the innermost scope containing `xpath` in `file`, or `None`.
pub fn find_scope(graph: &ScopeGraph, file: &Path, xpath: &str) -> Option<Handle<Scope>> {
    graph.get_scope_for_location(file, xpath)
}

/// `FindScope<K>(...)`: the nearest enclosing scope of kind `filter`, starting from the innermost
/// scope containing `xpath`.
pub fn find_scope_of_kind(
    graph: &ScopeGraph,
    file: &Path,
    xpath: &str,
    filter: ScopeKindFilter,
) -> Option<Handle<Scope>> {
    let start = graph.get_scope_for_location(file, xpath)?;
    graph.ancestors_and_self(start, filter).next()
}

/// `FindMethodCalls(loc|xpath|element)`: every method call whose location is contained within the
/// scope at `xpath` (including calls in nested scopes), nearest-first — descending by starting
/// line, then starting column.
pub fn find_method_calls(graph: &ScopeGraph, file: &Path, xpath: &str) -> Vec<Handle<MethodCall>> {
    let Some(scope) = graph.get_scope_for_location(file, xpath) else {
        return Vec::new();
    };
    let mut calls = Vec::new();
    collect_method_calls(graph, scope, &mut calls);
    calls
        .into_iter()
        .sorted_by(|&a, &b| graph.method_call(b).location.cmp(&graph.method_call(a).location))
        .collect()
}

fn collect_method_calls(graph: &ScopeGraph, scope: Handle<Scope>, out: &mut Vec<Handle<MethodCall>>) {
    out.extend(graph.scope(scope).method_calls().iter().copied());
    for child in graph.children_of(scope) {
        collect_method_calls(graph, child, out);
    }
}
