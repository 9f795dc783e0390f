// ------------------------------------------------------------------------------------------------
// Copyright © 2021, stack-graphs authors.
// Licensed under either of Apache License, Version 2.0, or MIT license, at your option.
// Please see the LICENSE-APACHE or LICENSE-MIT files in this distribution for license details.
// ------------------------------------------------------------------------------------------------

//! The parser plug-in surface (C4): language-keyed lowering of a file unit into an unmerged scope
//! tree.
//!
//! A [`Parser`] is deliberately narrow: it receives one [`FileUnit`] and returns one
//! [`ScopeGraph`] (a tree rooted at its own `Program` surrogate, ready to hand to
//! [`crate::merge::merge_file`]) or a [`ParseError`]. What XML elements map to what scope kinds is
//! not specified here — that is a per-language lowering rule, out of scope for this crate — only
//! the contract a parser must honor: pure of global state, safe to call concurrently on distinct
//! inputs, never returning a partial tree on failure.

use std::path::PathBuf;
use std::sync::Arc;

use fxhash::FxHashMap;
use parking_lot::Mutex;

use crate::graph::{Language, ScopeGraph};

/// One file's syntactic markup, as handed to a [`Parser`]. The XML schema itself (declaration,
/// type, name, operator, call, block, import/using, alias, extern-linkage elements per spec.md
/// §6) is produced by an external collaborator and is opaque here; `xml` is carried as raw text so
/// a real parser implementation can lower it however it likes.
#[derive(Clone, Debug)]
pub struct FileUnit {
    pub path: PathBuf,
    pub language: Language,
    pub xml: String,
}

impl FileUnit {
    pub fn new(path: impl Into<PathBuf>, language: Language, xml: impl Into<String>) -> FileUnit {
        FileUnit {
            path: path.into(),
            language,
            xml: xml.into(),
        }
    }
}

/// Raised when lowering a single file unit fails. Carries the offending XPath so the caller can
/// point a user at the failing element.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ParseError {
    pub xpath: String,
    pub message: String,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{} (at {})", self.message, self.xpath)
    }
}

impl std::error::Error for ParseError {}

/// `ParseFileUnit(unit)`. Implementations must be pure of global state and safe to invoke
/// concurrently on distinct `FileUnit`s (the ingest pipeline's producer pool does exactly this).
pub trait Parser: Send + Sync {
    fn parse_file_unit(&self, unit: &FileUnit) -> Result<ScopeGraph, ParseError>;
}

/// The read-only `Language → Parser` table, installed once at repository construction (spec.md
/// §5's "shared resources... installed once at construction and read-only thereafter").
pub struct ParserRegistry {
    parsers: FxHashMap<Language, Arc<dyn Parser>>,
}

impl ParserRegistry {
    pub fn new() -> ParserRegistry {
        ParserRegistry {
            parsers: FxHashMap::default(),
        }
    }

    pub fn register(&mut self, language: Language, parser: Arc<dyn Parser>) -> &mut Self {
        self.parsers.insert(language, parser);
        self
    }

    pub fn get(&self, language: Language) -> Option<&Arc<dyn Parser>> {
        self.parsers.get(&language)
    }
}

impl Default for ParserRegistry {
    /// Spec.md §6's stated default: "`parserMap`... default includes C, C++, Java, C#". No
    /// production XML-to-scope-tree lowering is in scope for this crate (see DESIGN.md), so the
    /// default table registers [`NullParser`] for all four languages rather than leaving them
    /// unregistered.
    fn default() -> ParserRegistry {
        let mut registry = ParserRegistry::new();
        let null: Arc<dyn Parser> = Arc::new(NullParser);
        registry
            .register(Language::C, Arc::clone(&null))
            .register(Language::Cpp, Arc::clone(&null))
            .register(Language::Java, Arc::clone(&null))
            .register(Language::CSharp, null);
        registry
    }
}

/// A parser that always succeeds with an empty tree. Useful as a default/fixture parser, and for
/// exercising the pipeline's plumbing independent of any real lowering logic.
pub struct NullParser;

impl Parser for NullParser {
    fn parse_file_unit(&self, _unit: &FileUnit) -> Result<ScopeGraph, ParseError> {
        Ok(ScopeGraph::new())
    }
}

/// A canned (path, tree) fixture for [`FakeParser`], standing in for a real XML file unit plus
/// its lowering result. Used by the test suite and by the CLI demo, since no production
/// XML-to-scope-tree lowering is in scope here (C4's contract is specified, not any particular
/// language's rules).
pub struct FakeXmlFileUnit {
    pub path: PathBuf,
    pub language: Language,
    pub tree: ScopeGraph,
}

impl FakeXmlFileUnit {
    pub fn new(path: impl Into<PathBuf>, language: Language, tree: ScopeGraph) -> FakeXmlFileUnit {
        FakeXmlFileUnit {
            path: path.into(),
            language,
            tree,
        }
    }

    pub fn as_file_unit(&self) -> FileUnit {
        FileUnit::new(self.path.clone(), self.language, String::new())
    }
}

/// A test-fixture [`Parser`] that returns a pre-registered tree for each path instead of lowering
/// XML. Each fixture is consumed exactly once, matching a real parser's one-shot-per-event
/// behavior.
#[derive(Default)]
pub struct FakeParser {
    trees: Mutex<FxHashMap<PathBuf, ScopeGraph>>,
}

impl FakeParser {
    pub fn new() -> FakeParser {
        FakeParser::default()
    }

    pub fn register(&self, unit: FakeXmlFileUnit) {
        self.trees.lock().insert(unit.path, unit.tree);
    }
}

impl Parser for FakeParser {
    fn parse_file_unit(&self, unit: &FileUnit) -> Result<ScopeGraph, ParseError> {
        self.trees.lock().remove(&unit.path).ok_or_else(|| ParseError {
            xpath: "/".to_string(),
            message: format!("no fixture registered for {}", unit.path.display()),
        })
    }
}
