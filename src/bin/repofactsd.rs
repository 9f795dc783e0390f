// -*- coding: utf-8 -*-
// ------------------------------------------------------------------------------------------------
// Copyright © 2021, stack-graphs authors.
// Licensed under either of Apache License, Version 2.0, or MIT license, at your option.
// Please see the LICENSE-APACHE or LICENSE-MIT files in this distribution for license details.
// ------------------------------------------------------------------------------------------------

//! A thin demo binary that wires a [`NullParser`][progfact_graph::parser::NullParser]-backed
//! repository to stdin-delivered `FileEvent` lines, for manual exercise and smoke testing. Real
//! XML-to-scope-tree lowering, directory watching, and CLI plumbing beyond this demo are explicit
//! exclusions of the crate (see spec.md §1) — this binary exists to give the library a runnable
//! shape, in the spirit of the teacher crate's own `tree-sitter-stack-graphs` CLI convention.

use std::io::{self, BufRead};
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use progfact_graph::config::RepositoryConfig;
use progfact_graph::event::{FileEvent, RepositoryEvent};
use progfact_graph::graph::Language;
use progfact_graph::parser::{FileUnit, ParserRegistry};
use progfact_graph::Repository;

/// Lines look like `<kind> <path> [old_path] <language>`, where `<kind>` is one of
/// `added`/`changed`/`deleted`/`renamed` and `<language>` is one of `c`/`cpp`/`java`/`csharp`
/// (omitted for `deleted`). This is a demo line protocol, not a stable interface.
#[derive(Parser)]
#[clap(about, version)]
struct Cli {
    /// Path to a snapshot file to load on startup and save on exit.
    #[clap(long, value_name = "PATH")]
    snapshot: Option<PathBuf>,

    /// Merge-pipeline worker count. Defaults to the host's available parallelism.
    #[clap(long)]
    parallelism: Option<usize>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let mut config = RepositoryConfig::default();
    config.snapshot_path = cli.snapshot;
    if let Some(parallelism) = cli.parallelism {
        config.parallelism = parallelism;
    }

    let repo = Repository::new(config, ParserRegistry::default());
    let events = repo.subscribe();
    std::thread::spawn(move || {
        for event in events {
            log_event(&event);
        }
    });

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match parse_line(line) {
            Ok((event, unit)) => repo.handle_event(event, unit),
            Err(message) => eprintln!("skipping malformed line {line:?}: {message}"),
        }
    }

    // Give the async event logger a moment to drain before the repository (and its
    // save-on-drop snapshot) tears down.
    std::thread::sleep(Duration::from_millis(50));
    Ok(())
}

fn log_event(event: &RepositoryEvent) {
    match event {
        RepositoryEvent::FileProcessed { kind, path } => {
            println!("processed {kind:?} {}", path.display());
        }
        RepositoryEvent::ErrorRaised(err) => {
            eprintln!("error: {err}");
        }
        RepositoryEvent::IsReadyChanged(ready) => {
            println!("ready={ready}");
        }
    }
}

fn parse_line(line: &str) -> Result<(FileEvent, Option<FileUnit>), String> {
    let mut parts = line.split_whitespace();
    let kind = parts.next().ok_or("missing event kind")?;
    match kind {
        "added" | "changed" => {
            let path = parts.next().ok_or("missing path")?;
            let language = parse_language(parts.next().ok_or("missing language")?)?;
            let event = if kind == "added" {
                FileEvent::added(path)
            } else {
                FileEvent::changed(path)
            };
            Ok((event, Some(FileUnit::new(path, language, String::new()))))
        }
        "deleted" => {
            let path = parts.next().ok_or("missing path")?;
            Ok((FileEvent::deleted(path), None))
        }
        "renamed" => {
            let old_path = parts.next().ok_or("missing old path")?;
            let path = parts.next().ok_or("missing new path")?;
            let language = parse_language(parts.next().ok_or("missing language")?)?;
            Ok((
                FileEvent::renamed(old_path, path),
                Some(FileUnit::new(path, language, String::new())),
            ))
        }
        other => Err(format!("unknown event kind {other:?}")),
    }
}

fn parse_language(token: &str) -> Result<Language, String> {
    match token {
        "c" => Ok(Language::C),
        "cpp" => Ok(Language::Cpp),
        "java" => Ok(Language::Java),
        "csharp" => Ok(Language::CSharp),
        other => Err(format!("unknown language {other:?}")),
    }
}
