// -*- coding: utf-8 -*-
// ------------------------------------------------------------------------------------------------
// Copyright © 2021, stack-graphs authors.
// Licensed under either of Apache License, Version 2.0, or MIT license, at your option.
// Please see the LICENSE-APACHE or LICENSE-MIT files in this distribution for license details.
// ------------------------------------------------------------------------------------------------

//! The algebraic laws spec.md §8 states for `merge`/`removeFile`: order-independence across files,
//! and exact inversion of a file's own contribution. Driven directly through `merge::merge_file`
//! and `merge::remove_file` rather than through the pipeline, since these are properties of the
//! algebra itself, independent of how events get dispatched to it.

use pretty_assertions::assert_eq;
use progfact_graph::graph::{Language, ScopeKindFilter};
use progfact_graph::merge;

use crate::fixtures;

fn scope_count(graph: &progfact_graph::graph::ScopeGraph) -> usize {
    graph.iter_scopes().count()
}

/// Merging file A then B produces the same graph shape as merging B then A.
#[test]
fn merge_is_order_independent() {
    let a = fixtures::namespace_with_class("a.cpp");
    let b = fixtures::namespace_with_class("b.cpp");

    let mut ab = progfact_graph::graph::ScopeGraph::new();
    merge::merge_file(&mut ab, &a, Language::Cpp);
    merge::merge_file(&mut ab, &b, Language::Cpp);

    let mut ba = progfact_graph::graph::ScopeGraph::new();
    merge::merge_file(&mut ba, &b, Language::Cpp);
    merge::merge_file(&mut ba, &a, Language::Cpp);

    assert_eq!(scope_count(&ab), scope_count(&ba));
    for graph in [&ab, &ba] {
        let namespaces: Vec<_> = graph
            .named_children(graph.program(), "N", ScopeKindFilter::Namespace)
            .collect();
        assert_eq!(namespaces.len(), 1);
    }
}

/// Merging three files groups the same regardless of which pair is folded first.
#[test]
fn merge_is_associative() {
    let a = fixtures::numbered_method_file("a.cpp", 1);
    let b = fixtures::numbered_method_file("b.cpp", 2);
    let c = fixtures::numbered_method_file("c.cpp", 3);

    let mut left = progfact_graph::graph::ScopeGraph::new();
    merge::merge_file(&mut left, &a, Language::Cpp);
    merge::merge_file(&mut left, &b, Language::Cpp);
    merge::merge_file(&mut left, &c, Language::Cpp);

    let mut right = progfact_graph::graph::ScopeGraph::new();
    merge::merge_file(&mut right, &a, Language::Cpp);
    let mut bc = progfact_graph::graph::ScopeGraph::new();
    merge::merge_file(&mut bc, &b, Language::Cpp);
    merge::merge_file(&mut bc, &c, Language::Cpp);
    merge::merge_file(&mut right, &bc, Language::Cpp);

    assert_eq!(scope_count(&left), scope_count(&right));
}

/// Merging a file then immediately removing it returns the graph to its prior scope count — the
/// empty graph's single `Program` root, in this case.
#[test]
fn remove_file_inverts_merge_on_an_otherwise_empty_graph() {
    let incoming = fixtures::namespace_with_class("solo.cpp");
    let mut graph = progfact_graph::graph::ScopeGraph::new();
    let before = scope_count(&graph);

    merge::merge_file(&mut graph, &incoming, Language::Cpp);
    assert!(scope_count(&graph) > before);

    merge::remove_file(&mut graph, std::path::Path::new("solo.cpp"));
    assert_eq!(scope_count(&graph), before);
}

/// Removing one of two files that both contributed to the same coalesced namespace/type leaves
/// the other file's contribution untouched — removal is local to the removed file's own locations.
#[test]
fn remove_file_is_local_to_its_own_contribution() {
    let a = fixtures::namespace_with_class("a.cpp");
    let b = fixtures::namespace_with_class("b.cpp");

    let mut graph = progfact_graph::graph::ScopeGraph::new();
    merge::merge_file(&mut graph, &a, Language::Cpp);
    merge::merge_file(&mut graph, &b, Language::Cpp);

    merge::remove_file(&mut graph, std::path::Path::new("a.cpp"));

    let namespaces: Vec<_> = graph
        .named_children(graph.program(), "N", ScopeKindFilter::Namespace)
        .collect();
    assert_eq!(namespaces.len(), 1, "b.cpp's contribution must survive a.cpp's removal");
    let types: Vec<_> = graph
        .named_children(namespaces[0], "C", ScopeKindFilter::Type)
        .collect();
    assert_eq!(graph.scope(types[0]).locations()[0].file.to_str().unwrap(), "b.cpp");
}
