// -*- coding: utf-8 -*-
// ------------------------------------------------------------------------------------------------
// Copyright © 2021, stack-graphs authors.
// Licensed under either of Apache License, Version 2.0, or MIT license, at your option.
// Please see the LICENSE-APACHE or LICENSE-MIT files in this distribution for license details.
// ------------------------------------------------------------------------------------------------

//! Small unmerged-tree builders shared by the scenario/algebra/concurrency tests, standing in for
//! what a real `Parser::parse_file_unit` would lower from file-unit XML. Each function mirrors one
//! row of spec.md §8's "Concrete scenarios" table, built entirely through `ScopeGraph`'s public
//! construction API, exactly as an out-of-tree parser crate would.

use progfact_graph::graph::{ControlFlowKind, ScopeGraph, ScopeKind, StatementKind};
use progfact_graph::location::Location;

fn loc(file: &str, xpath: &str, line: u32) -> Location {
    Location::new(file, xpath, line, 1, 1)
}

/// `namespace N { class C {}; }` — scenario 1/2.
pub fn namespace_with_class(file: &str) -> ScopeGraph {
    let mut graph = ScopeGraph::new();
    let program = graph.program();

    let ns = graph.add_scope(ScopeKind::NamespaceDefinition, program, loc(file, "/ns", 1));
    let ns_name = graph.intern_string("N");
    graph.name_scope(ns, ns_name, ns_name);
    graph.add_statement(program, StatementKind::Scope(ns), loc(file, "/ns", 1));

    let ty = graph.add_scope(ScopeKind::TypeDefinition, ns, loc(file, "/ns/ty", 1));
    let simple = graph.intern_string("C");
    let qualified = graph.intern_string("N::C");
    graph.name_scope(ty, simple, qualified);
    graph.add_statement(ns, StatementKind::Scope(ty), loc(file, "/ns/ty", 1));

    graph
}

/// `extern "C" { void foo(); }` — the file1 half of scenario 5.
pub fn extern_c_foo_declaration(file: &str) -> ScopeGraph {
    let mut graph = ScopeGraph::new();
    let program = graph.program();

    let foo = graph.add_scope(ScopeKind::MethodDefinition, program, loc(file, "/extern/foo", 1));
    let name = graph.intern_string("foo");
    graph.name_scope(foo, name, name);
    let foo_stmt = graph.add_statement(program, StatementKind::Scope(foo), loc(file, "/extern/foo", 1));

    let linkage = graph.intern_string("C");
    graph.add_statement(
        program,
        StatementKind::Extern {
            linkage,
            body: vec![foo_stmt],
        },
        loc(file, "/extern", 1),
    );

    graph
}

/// `void foo() {}` — the file2 half of scenario 5, no extern wrapper.
pub fn plain_foo_definition(file: &str) -> ScopeGraph {
    let mut graph = ScopeGraph::new();
    let program = graph.program();

    let foo = graph.add_scope(ScopeKind::MethodDefinition, program, loc(file, "/foo", 1));
    let name = graph.intern_string("foo");
    graph.name_scope(foo, name, name);
    graph.add_statement(program, StatementKind::Scope(foo), loc(file, "/foo", 1));

    graph
}

/// A single top-level `void run_N() { if (cond) {} }`-shaped file, parameterized by `seed` so
/// bulk-ingest tests can generate many distinct, non-colliding files quickly.
pub fn numbered_method_file(file: &str, seed: u32) -> ScopeGraph {
    let mut graph = ScopeGraph::new();
    let program = graph.program();

    let method = graph.add_scope(ScopeKind::MethodDefinition, program, loc(file, "/m", 1));
    let name = graph.intern_string(&format!("run_{seed}"));
    graph.name_scope(method, name, name);
    graph.add_statement(program, StatementKind::Scope(method), loc(file, "/m", 1));

    let block = graph.add_scope(ScopeKind::Block, method, loc(file, "/m/block", 2));
    graph.add_statement(method, StatementKind::Scope(block), loc(file, "/m/block", 2));

    graph.add_statement(
        block,
        StatementKind::ControlFlow {
            tag: ControlFlowKind::If,
            children: Vec::new(),
        },
        loc(file, "/m/block/if", 3),
    );

    graph
}
