// -*- coding: utf-8 -*-
// ------------------------------------------------------------------------------------------------
// Copyright © 2021, stack-graphs authors.
// Licensed under either of Apache License, Version 2.0, or MIT license, at your option.
// Please see the LICENSE-APACHE or LICENSE-MIT files in this distribution for license details.
// ------------------------------------------------------------------------------------------------

//! End-to-end scenarios driven through the public [`Repository`] facade, one per row of spec.md
//! §8's "Concrete scenarios" table. The merge/remove algebra's own unit tests already cover the
//! tree-level mechanics in isolation (see `merge.rs`); these exercise the same behavior the way a
//! real caller would reach it — through events, a parser registry, and the lock.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use progfact_graph::config::RepositoryConfig;
use progfact_graph::event::{FileEvent, FileEventKind, RepositoryEvent};
use progfact_graph::graph::{Language, ScopeKindFilter};
use progfact_graph::parser::{FakeParser, FakeXmlFileUnit, Parser, ParserRegistry};
use progfact_graph::Repository;

use crate::fixtures;

fn repo_with_fake_cpp_parser() -> (Repository, Arc<FakeParser>) {
    let fake = Arc::new(FakeParser::new());
    let mut registry = ParserRegistry::new();
    registry.register(Language::Cpp, Arc::clone(&fake) as Arc<dyn Parser>);
    let config = RepositoryConfig {
        parallelism: 2,
        ..RepositoryConfig::default()
    };
    (Repository::new(config, registry), fake)
}

fn wait_for_processed(rx: &crossbeam_channel::Receiver<RepositoryEvent>, kind: FileEventKind, path: &Path) {
    for _ in 0..16 {
        if let Ok(RepositoryEvent::FileProcessed { kind: got_kind, path: got_path }) =
            rx.recv_timeout(Duration::from_secs(2))
        {
            if got_kind == kind && got_path.as_path() == path {
                return;
            }
        }
    }
    panic!("timed out waiting for FileProcessed({kind:?}, {})", path.display());
}

/// Scenario 1: two files each declare `namespace N { class C {}; }`. After both are ingested the
/// global graph has exactly one `N` namespace and one `N::C` type, not two of each.
#[test]
fn two_files_coalesce_namespace_and_type() {
    let (repo, fake) = repo_with_fake_cpp_parser();
    let rx = repo.subscribe();

    fake.register(FakeXmlFileUnit::new("a.cpp", Language::Cpp, fixtures::namespace_with_class("a.cpp")));
    let (event, unit) = progfact_graph::repository::added_unit("a.cpp", Language::Cpp, "");
    repo.handle_event(event, Some(unit));
    wait_for_processed(&rx, FileEventKind::Added, Path::new("a.cpp"));

    fake.register(FakeXmlFileUnit::new("b.cpp", Language::Cpp, fixtures::namespace_with_class("b.cpp")));
    let (event, unit) = progfact_graph::repository::added_unit("b.cpp", Language::Cpp, "");
    repo.handle_event(event, Some(unit));
    wait_for_processed(&rx, FileEventKind::Added, Path::new("b.cpp"));

    repo.with_graph(|graph| {
        let namespaces: Vec<_> = graph
            .named_children(graph.program(), "N", ScopeKindFilter::Namespace)
            .collect();
        assert_eq!(namespaces.len(), 1, "expected N to coalesce into one namespace");

        let types: Vec<_> = graph
            .named_children(namespaces[0], "C", ScopeKindFilter::Type)
            .collect();
        assert_eq!(types.len(), 1, "expected N::C to coalesce into one type");

        let merged = graph.scope(types[0]);
        assert_eq!(merged.locations().len(), 2, "the surviving type should carry both files' locations");
    });
}

/// Scenario 2: removing one of two files that contributed to a coalesced namespace/type shrinks
/// its location set but keeps the surviving node (and its still-live file's contribution) intact.
#[test]
fn removing_one_file_shrinks_locations_and_keeps_survivor() {
    let (repo, fake) = repo_with_fake_cpp_parser();
    let rx = repo.subscribe();

    for file in ["a.cpp", "b.cpp"] {
        fake.register(FakeXmlFileUnit::new(file, Language::Cpp, fixtures::namespace_with_class(file)));
        let (event, unit) = progfact_graph::repository::added_unit(file, Language::Cpp, "");
        repo.handle_event(event, Some(unit));
        wait_for_processed(&rx, FileEventKind::Added, Path::new(file));
    }

    repo.handle_event(FileEvent::deleted("a.cpp"), None);
    wait_for_processed(&rx, FileEventKind::Deleted, Path::new("a.cpp"));

    repo.with_graph(|graph| {
        let namespaces: Vec<_> = graph
            .named_children(graph.program(), "N", ScopeKindFilter::Namespace)
            .collect();
        assert_eq!(namespaces.len(), 1, "the namespace survives since b.cpp still contributes to it");

        let types: Vec<_> = graph
            .named_children(namespaces[0], "C", ScopeKindFilter::Type)
            .collect();
        assert_eq!(types.len(), 1);
        let survivor = graph.scope(types[0]);
        assert_eq!(survivor.locations().len(), 1);
        assert_eq!(survivor.locations()[0].file.to_str().unwrap(), "b.cpp");
    });
}

/// Scenario 5: an `extern "C" { void foo(); }` in one file and a plain `void foo() {}` definition
/// in another coalesce to one `foo` method, and the extern wrapper is retained in the statement
/// list even though it is invisible to `GetNamedChildren`.
#[test]
fn extern_linkage_is_transparent_to_coalescing_but_not_deleted() {
    let (repo, fake) = repo_with_fake_cpp_parser();
    let rx = repo.subscribe();

    fake.register(FakeXmlFileUnit::new(
        "decl.cpp",
        Language::Cpp,
        fixtures::extern_c_foo_declaration("decl.cpp"),
    ));
    let (event, unit) = progfact_graph::repository::added_unit("decl.cpp", Language::Cpp, "");
    repo.handle_event(event, Some(unit));
    wait_for_processed(&rx, FileEventKind::Added, Path::new("decl.cpp"));

    fake.register(FakeXmlFileUnit::new(
        "def.cpp",
        Language::Cpp,
        fixtures::plain_foo_definition("def.cpp"),
    ));
    let (event, unit) = progfact_graph::repository::added_unit("def.cpp", Language::Cpp, "");
    repo.handle_event(event, Some(unit));
    wait_for_processed(&rx, FileEventKind::Added, Path::new("def.cpp"));

    repo.with_graph(|graph| {
        let program = graph.program();
        let foos: Vec<_> = graph
            .named_children(program, "foo", ScopeKindFilter::Method)
            .collect();
        assert_eq!(foos.len(), 1, "extern and plain foo should coalesce to one method");
        assert_eq!(graph.scope(foos[0]).locations().len(), 2);

        let has_extern_statement = graph
            .scope(program)
            .statements()
            .iter()
            .any(|&s| matches!(graph.statement(s).kind, progfact_graph::graph::StatementKind::Extern { .. }));
        assert!(has_extern_statement, "the extern wrapper statement must survive the merge");
    });
}

/// Scenario 6, scaled down: many distinct files ingested concurrently all land in the graph, and a
/// save/clear/load round trip through the `bincode-snapshot` feature reproduces the same scope
/// count.
#[cfg(feature = "bincode-snapshot")]
#[test]
fn bulk_ingest_then_snapshot_round_trip_is_equivalent() {
    let (repo, fake) = repo_with_fake_cpp_parser();
    let rx = repo.subscribe();

    const FILE_COUNT: u32 = 64;
    for seed in 0..FILE_COUNT {
        let path = format!("gen_{seed}.cpp");
        fake.register(FakeXmlFileUnit::new(
            path.clone(),
            Language::Cpp,
            fixtures::numbered_method_file(&path, seed),
        ));
    }
    for seed in 0..FILE_COUNT {
        let path = format!("gen_{seed}.cpp");
        let (event, unit) = progfact_graph::repository::added_unit(path.clone(), Language::Cpp, "");
        repo.handle_event(event, Some(unit));
    }
    for seed in 0..FILE_COUNT {
        wait_for_processed(&rx, FileEventKind::Added, Path::new(&format!("gen_{seed}.cpp")));
    }

    let before = repo.with_graph(|graph| graph.iter_scopes().count());

    let dir = tempdir();
    let snapshot_path = dir.join("graph.bin");
    repo.save_snapshot(&snapshot_path).expect("save snapshot");
    repo.clear();
    repo.with_graph(|graph| assert_eq!(graph.iter_scopes().count(), 1, "clear resets to just Program"));
    repo.load_snapshot(&snapshot_path).expect("load snapshot");

    let after = repo.with_graph(|graph| graph.iter_scopes().count());
    assert_eq!(before, after);
    std::fs::remove_dir_all(&dir).ok();
}

#[cfg(feature = "bincode-snapshot")]
fn tempdir() -> std::path::PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "progfact-graph-it-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0)
    ));
    std::fs::create_dir_all(&dir).expect("create temp dir");
    dir
}
