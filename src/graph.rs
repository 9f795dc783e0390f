// ------------------------------------------------------------------------------------------------
// Copyright © 2021, stack-graphs authors.
// Licensed under either of Apache License, Version 2.0, or MIT license, at your option.
// Please see the LICENSE-APACHE or LICENSE-MIT files in this distribution for license details.
// ------------------------------------------------------------------------------------------------

//! The scope graph data model (C1).
//!
//! A [`ScopeGraph`] holds every [`Scope`], [`Statement`], [`Expression`], [`VariableDeclaration`]
//! and [`MethodCall`] produced by lowering file units, folded together by [`crate::merge`]. There
//! is exactly one [`ScopeGraph::program`] per graph (invariant #1); everything else is owned,
//! directly or transitively, by the program scope.
//!
//! Kinds are a closed, tagged variant ([`ScopeKind`], [`StatementKind`], [`ExpressionKind`]) by
//! design (see DESIGN.md): adding a new kind is meant to be a breaking change, so that the match
//! arms in this module and in [`crate::merge`]/[`crate::resolve`] stay exhaustive.

use std::path::Path;

use either::Either;
use fxhash::FxHashMap;
use smallvec::SmallVec;

use crate::arena::{Arena, Handle};
use crate::location::Location;

/// Most scopes carry exactly one location; a node only grows a second (or third...) once merge
/// coalesces the same file-unit across multiple source files. Inlining the common one-location
/// case avoids a heap allocation per scope, matching the teacher's preference for `smallvec` over
/// a bare `Vec` on small, usually-singleton collections (see `stack_graphs::arena`'s own deques).
pub type LocationSet = SmallVec<[Location; 1]>;

//-------------------------------------------------------------------------------------------------
// Interned strings

/// Interns strings (symbol names, xpaths, qualified names) so that the graph stores each
/// distinct string once. Unlike the teacher's `InternedStringArena`, this holds plain owned
/// `Box<str>` rather than raw pointers into a bump buffer — we trade a little density for not
/// needing to hand-verify `unsafe` we can't compile-check.
#[derive(Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StringArena {
    strings: Arena<Box<str>>,
    handles: FxHashMap<Box<str>, Handle<Box<str>>>,
}

pub type InternedString = Box<str>;

impl StringArena {
    pub fn new() -> StringArena {
        StringArena::default()
    }

    pub fn intern(&mut self, value: &str) -> Handle<InternedString> {
        if let Some(handle) = self.handles.get(value) {
            return *handle;
        }
        let handle = self.strings.add(value.into());
        self.handles.insert(value.into(), handle);
        handle
    }

    pub fn resolve(&self, handle: Handle<InternedString>) -> &str {
        &self.strings[handle]
    }
}

//-------------------------------------------------------------------------------------------------
// Languages

/// The language a file unit is tagged with, per spec.md §6. Determines keyword short-circuit
/// behavior in name resolution (`this`/`base`/`super`) and which [`crate::parser::Parser`] is
/// dispatched to for a given file.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Language {
    C,
    Cpp,
    Java,
    CSharp,
}

//-------------------------------------------------------------------------------------------------
// Scopes

/// The kind of a [`Scope`] node. A closed, small set by design: extending it is a deliberate,
/// breaking change (see DESIGN.md's note on runtime polymorphism).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ScopeKind {
    /// The unique root of the graph.
    Program,
    NamespaceDefinition,
    TypeDefinition,
    MethodDefinition,
    PropertyDefinition,
    /// A lexical block with no introduced name.
    Block,
}

impl ScopeKind {
    /// Whether this kind introduces a name (i.e. is a `NamedScope` per spec.md §3).
    pub fn is_named(self) -> bool {
        !matches!(self, ScopeKind::Program | ScopeKind::Block)
    }
}

/// A filter used by the traversal primitives of §4.1 to select scopes of a particular kind (or
/// kind family). Stands in for the spec's generic `<K>` type parameter, since Rust's scope graph
/// here uses a closed enum rather than a class hierarchy.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ScopeKindFilter {
    Any,
    /// Any `NamedScope` (`INamedEntity` in the spec's Open Question #2 terms).
    AnyNamed,
    Namespace,
    Type,
    Method,
    Property,
    Block,
    Program,
}

impl ScopeKindFilter {
    pub fn matches(self, kind: ScopeKind) -> bool {
        match self {
            ScopeKindFilter::Any => true,
            ScopeKindFilter::AnyNamed => kind.is_named(),
            ScopeKindFilter::Namespace => kind == ScopeKind::NamespaceDefinition,
            ScopeKindFilter::Type => kind == ScopeKind::TypeDefinition,
            ScopeKindFilter::Method => kind == ScopeKind::MethodDefinition,
            ScopeKindFilter::Property => kind == ScopeKind::PropertyDefinition,
            ScopeKindFilter::Block => kind == ScopeKind::Block,
            ScopeKindFilter::Program => kind == ScopeKind::Program,
        }
    }
}

/// The broadened `INamedEntity` result of [`ScopeGraph::named_entities`] (Open Question #2):
/// either a nested `NamedScope` or one of the searched scope's own `VariableDeclaration`s.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum NamedEntity {
    Scope(Handle<Scope>),
    Declaration(Handle<VariableDeclaration>),
}

/// A scope node: a `Program`, a `NamedScope` (namespace/type/method/property definition), or a
/// lexical `Block`. Holds its own declarations, method calls, and ordered body statements (some
/// of which wrap nested child scopes — see [`ScopeGraph::children_of`]).
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Scope {
    pub kind: ScopeKind,
    pub simple_name: Option<Handle<InternedString>>,
    pub qualified_name: Option<Handle<InternedString>>,
    /// Distinguishes overloads of a `MethodDefinition`/`PropertyDefinition` sharing a qualified
    /// name; `None` for kinds that cannot be overloaded.
    pub signature: Option<Handle<InternedString>>,
    /// The language of the file unit that (first) contributed this scope; used for `base`/`super`
    /// keyword resolution (spec.md §4.3 step 1).
    pub language: Option<Language>,
    pub(crate) parent: Option<Handle<Scope>>,
    pub(crate) statements: Vec<Handle<Statement>>,
    pub(crate) declarations: Vec<Handle<VariableDeclaration>>,
    pub(crate) method_calls: Vec<Handle<MethodCall>>,
    pub(crate) locations: LocationSet,
}

impl Scope {
    pub(crate) fn new(kind: ScopeKind, parent: Option<Handle<Scope>>, location: Location) -> Scope {
        Scope {
            kind,
            simple_name: None,
            qualified_name: None,
            signature: None,
            language: None,
            parent,
            statements: Vec::new(),
            declarations: Vec::new(),
            method_calls: Vec::new(),
            locations: smallvec::smallvec![location],
        }
    }

    /// The lexically smallest of this scope's locations (invariant #2).
    pub fn primary_location(&self) -> &Location {
        crate::location::primary_location(&self.locations)
            .expect("a Scope always has at least one location")
    }

    pub fn locations(&self) -> &[Location] {
        &self.locations
    }

    pub fn declarations(&self) -> &[Handle<VariableDeclaration>] {
        &self.declarations
    }

    pub fn method_calls(&self) -> &[Handle<MethodCall>] {
        &self.method_calls
    }

    pub fn statements(&self) -> &[Handle<Statement>] {
        &self.statements
    }

    pub fn parent(&self) -> Option<Handle<Scope>> {
        self.parent
    }
}

//-------------------------------------------------------------------------------------------------
// Declarations and calls

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VariableDeclaration {
    pub name: Handle<InternedString>,
    pub declared_type: Option<Handle<Expression>>,
    pub initializer: Option<Handle<Expression>>,
    pub location: Location,
    pub(crate) owning_scope: Handle<Scope>,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MethodCall {
    pub name: Handle<InternedString>,
    pub arguments: Vec<Handle<Expression>>,
    pub resolved_target_hint: Option<Handle<InternedString>>,
    pub location: Location,
    pub(crate) owning_scope: Handle<Scope>,
}

//-------------------------------------------------------------------------------------------------
// Statements

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ControlFlowKind {
    If,
    For,
    While,
    Switch,
    Try,
    Catch,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StatementKind {
    /// A nested child scope (a `Block`, or a `NamedScope` defined at statement position).
    Scope(Handle<Scope>),
    Import {
        imported_namespace: Handle<Expression>,
    },
    Alias {
        target: Handle<Expression>,
        alias_name: Handle<InternedString>,
    },
    /// Transparent for name matching (merge rule 5): its body's declarations merge into the
    /// enclosing scope's namespace, but the node itself is kept for round-tripping.
    Extern {
        linkage: Handle<InternedString>,
        body: Vec<Handle<Statement>>,
    },
    ControlFlow {
        tag: ControlFlowKind,
        children: Vec<Handle<Expression>>,
    },
    /// A call used as a statement in its own right (e.g. `foo();`).
    Call(Handle<MethodCall>),
    /// Anything else: a return statement, an expression statement, a plain declaration
    /// statement — modeled generically as a bag of child expressions.
    Generic { expressions: Vec<Handle<Expression>> },
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Statement {
    pub kind: StatementKind,
    pub(crate) owning_scope: Handle<Scope>,
    pub location: Location,
}

impl Statement {
    pub fn owning_scope(&self) -> Handle<Scope> {
        self.owning_scope
    }
}

//-------------------------------------------------------------------------------------------------
// Expressions
//
// Unlike `Scope`, an `Expression` does not carry a back-reference to its container. Nothing in
// the merge algebra or the resolution algorithm needs to walk *up* from an arbitrary expression:
// every algorithm that cares about a `NameUse`'s surroundings (its enclosing scope, its enclosing
// statement, its preceding siblings) receives that context explicitly from its caller, who
// already has it from having navigated down to the expression in the first place (see
// `resolve::find_matches`). This sidesteps the reserve/fill dance that a stored back-reference
// would otherwise require for `NamePrefix` chains.
//
// A `NamePrefix` (spec.md §3: "whose leaves are NameUses; resolves by left-to-right chaining") is
// represented here as a flat list of interned name segments rather than a nested expression tree.
// This captures ordinary qualified names (`A.B.C`) exactly; it does not capture a prefix that
// itself contains a non-name sub-expression (e.g. a cast or call before a further `.`), which is
// out of scope for this crate (see DESIGN.md).

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ExpressionKind {
    NameUse {
        name: Handle<InternedString>,
        /// The qualifier segments preceding `name`, left to right (`["A", "B"]` for `A.B.C`).
        prefix: Vec<Handle<InternedString>>,
    },
    OperatorUse {
        text: Handle<InternedString>,
    },
    MethodCall(Handle<MethodCall>),
    LiteralUse {
        text: Handle<InternedString>,
    },
    TypeUse {
        name: Handle<InternedString>,
    },
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Expression {
    pub kind: ExpressionKind,
    pub location: Location,
}

//-------------------------------------------------------------------------------------------------
// The scope graph

/// The qualified identity a `NamedScope` is coalesced by during merge: `(kind, qualified name,
/// signature)`, per invariant #3.
pub type ScopeIdentity = (ScopeKind, String, Option<String>);

/// The whole program-fact graph: one `Program` root plus every scope, statement, expression,
/// declaration and method call contributed by every ingested file.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScopeGraph {
    pub(crate) strings: StringArena,
    pub(crate) scopes: Arena<Scope>,
    pub(crate) statements: Arena<Statement>,
    pub(crate) expressions: Arena<Expression>,
    pub(crate) declarations: Arena<VariableDeclaration>,
    pub(crate) method_calls: Arena<MethodCall>,
    pub(crate) program: Handle<Scope>,
    /// Maps a `NamedScope`'s identity to its single node in the graph (invariant #3). Absent for
    /// `Program`/`Block` scopes, which never coalesce.
    pub(crate) identity_index: FxHashMap<ScopeIdentity, Handle<Scope>>,
}

impl Default for ScopeGraph {
    fn default() -> Self {
        let mut scopes = Arena::new();
        let program = scopes.add(Scope::new(
            ScopeKind::Program,
            None,
            Location::new("", "/", 0, 0, 0),
        ));
        ScopeGraph {
            strings: StringArena::new(),
            scopes,
            statements: Arena::new(),
            expressions: Arena::new(),
            declarations: Arena::new(),
            method_calls: Arena::new(),
            program,
            identity_index: FxHashMap::default(),
        }
    }
}

impl ScopeGraph {
    pub fn new() -> ScopeGraph {
        ScopeGraph::default()
    }

    pub fn program(&self) -> Handle<Scope> {
        self.program
    }

    pub fn scope(&self, handle: Handle<Scope>) -> &Scope {
        &self.scopes[handle]
    }

    pub fn scope_exists(&self, handle: Handle<Scope>) -> bool {
        self.scopes.contains(handle)
    }

    pub fn statement(&self, handle: Handle<Statement>) -> &Statement {
        &self.statements[handle]
    }

    pub fn expression(&self, handle: Handle<Expression>) -> &Expression {
        &self.expressions[handle]
    }

    pub fn declaration(&self, handle: Handle<VariableDeclaration>) -> &VariableDeclaration {
        &self.declarations[handle]
    }

    pub fn method_call(&self, handle: Handle<MethodCall>) -> &MethodCall {
        &self.method_calls[handle]
    }

    pub fn resolve_string(&self, handle: Handle<InternedString>) -> &str {
        self.strings.resolve(handle)
    }

    pub fn iter_scopes(&self) -> impl Iterator<Item = Handle<Scope>> + '_ {
        self.scopes.iter_handles()
    }

    /// The ordered child scopes of `scope`: the `Scope(_)`-kinded entries of its statement list,
    /// plus the bodies of any transparent `Extern` statements (merge rule 5).
    pub fn children_of(&self, scope: Handle<Scope>) -> impl Iterator<Item = Handle<Scope>> + '_ {
        self.statement_handles_including_extern_bodies(scope)
            .filter_map(move |stmt| match &self.statements[stmt].kind {
                StatementKind::Scope(child) => Some(*child),
                _ => None,
            })
    }

    /// Iterates over a scope's direct statements, transparently splicing in the bodies of any
    /// `Extern` statements at the position they occur (merge rule 5: extern linkage is invisible
    /// to name lookup, but the extern node itself is not removed from `statements()`).
    fn statement_handles_including_extern_bodies<'a>(
        &'a self,
        scope: Handle<Scope>,
    ) -> impl Iterator<Item = Handle<Statement>> + 'a {
        self.scopes[scope].statements.iter().flat_map(move |&stmt| {
            let nested = match &self.statements[stmt].kind {
                StatementKind::Extern { body, .. } => Either::Left(body.iter().copied()),
                _ => Either::Right(std::iter::empty()),
            };
            std::iter::once(stmt).chain(nested)
        })
    }

    /// `GetNamedChildren<K>(name)`: direct child named scopes of `scope` whose simple name
    /// equals `name` and kind matches `filter`.
    pub fn named_children<'a>(
        &'a self,
        scope: Handle<Scope>,
        name: &'a str,
        filter: ScopeKindFilter,
    ) -> impl Iterator<Item = Handle<Scope>> + 'a {
        self.children_of(scope).filter(move |&child| {
            let child_scope = &self.scopes[child];
            filter.matches(child_scope.kind)
                && child_scope
                    .simple_name
                    .map(|h| self.resolve_string(h) == name)
                    .unwrap_or(false)
        })
    }

    /// `GetNamedChildren<INamedEntity>(name)`, broadened per Open Question #2: a named member of
    /// `scope` can be a nested `NamedScope` (namespace/type/method/property) *or* one of `scope`'s
    /// own `VariableDeclaration`s (a field or local) — member and lexical lookup both need to find
    /// a field exactly as readily as a nested type (see `resolve`'s handling of `this.f`).
    pub fn named_entities<'a>(&'a self, scope: Handle<Scope>, name: &'a str) -> impl Iterator<Item = NamedEntity> + 'a {
        let scopes = self
            .named_children(scope, name, ScopeKindFilter::AnyNamed)
            .map(NamedEntity::Scope);
        let declarations = self.scopes[scope]
            .declarations
            .iter()
            .copied()
            .filter(move |&d| self.resolve_string(self.declarations[d].name) == name)
            .map(NamedEntity::Declaration);
        scopes.chain(declarations)
    }

    /// `GetAncestorsAndSelf<K>()`: ancestor scopes of `start` (inclusive) matching `filter`,
    /// nearest first.
    pub fn ancestors_and_self(
        &self,
        start: Handle<Scope>,
        filter: ScopeKindFilter,
    ) -> impl Iterator<Item = Handle<Scope>> + '_ {
        let mut current = Some(start);
        std::iter::from_fn(move || loop {
            let handle = current?;
            let scope = self.scopes.get(handle)?;
            current = scope.parent;
            if filter.matches(scope.kind) {
                return Some(handle);
            }
        })
    }

    /// `GetSiblingsBeforeSelf()`: child statements of `statement`'s owning scope that appear
    /// strictly earlier in that scope's (merged, source-ordered) statement list.
    pub fn siblings_before(
        &self,
        statement: Handle<Statement>,
    ) -> impl Iterator<Item = Handle<Statement>> + '_ {
        let owning_scope = self.statements[statement].owning_scope;
        let siblings = &self.scopes[owning_scope].statements;
        let index = siblings.iter().position(|&s| s == statement);
        let count = index.unwrap_or(0);
        siblings[..count].iter().copied()
    }

    /// Finds the `Statement::Scope` entry in `scope`'s parent that introduces `scope` itself,
    /// used by alias/import resolution (spec.md §4.3 step 5) to keep climbing outward once a
    /// scope's own sibling statements are exhausted.
    pub fn enclosing_statement_of(&self, scope: Handle<Scope>) -> Option<Handle<Statement>> {
        let parent = self.scopes[scope].parent?;
        self.scopes[parent]
            .statements
            .iter()
            .copied()
            .find(|&stmt| matches!(self.statements[stmt].kind, StatementKind::Scope(child) if child == scope))
    }

    /// `GetScopeForLocation(loc)`: the innermost scope whose location's xpath is a prefix of
    /// `xpath` in `file` (or an exact match). Ties are broken in favor of the longer (more
    /// specific) xpath, then the deepest scope (most ancestors).
    pub fn get_scope_for_location(&self, file: &Path, xpath: &str) -> Option<Handle<Scope>> {
        let mut best: Option<(Handle<Scope>, usize, usize)> = None;
        for (handle, scope) in self.scopes.iter() {
            let matched = scope
                .locations
                .iter()
                .any(|loc| loc.file == file && is_xpath_prefix(&loc.xpath, xpath));
            if !matched {
                continue;
            }
            let specificity = scope
                .locations
                .iter()
                .filter(|loc| loc.file == file && is_xpath_prefix(&loc.xpath, xpath))
                .map(|loc| loc.xpath.len())
                .max()
                .unwrap_or(0);
            let depth = self.depth_of(handle);
            let better = match best {
                None => true,
                Some((_, best_spec, best_depth)) => {
                    (specificity, depth) > (best_spec, best_depth)
                }
            };
            if better {
                best = Some((handle, specificity, depth));
            }
        }
        best.map(|(h, _, _)| h)
    }

    fn depth_of(&self, scope: Handle<Scope>) -> usize {
        let mut depth = 0;
        let mut current = self.scopes[scope].parent;
        while let Some(parent) = current {
            depth += 1;
            current = self.scopes[parent].parent;
        }
        depth
    }

    //---------------------------------------------------------------------------------------------
    // Construction
    //
    // A `Parser` lowers one file unit into a fresh `ScopeGraph` (its own tiny `Program` surrogate
    // plus everything beneath it) before handing it to `crate::merge::merge_file`. These are the
    // methods it builds that tree with; outside of `merge`, nothing in this crate mutates a graph
    // any other way.

    /// Interns `value` into this graph's string table, for use in any of the `Handle<InternedString>`
    /// fields below.
    pub fn intern_string(&mut self, value: &str) -> Handle<InternedString> {
        self.strings.intern(value)
    }

    /// Adds a new scope parented under `parent`. Every scope but the one `Program` root created by
    /// [`ScopeGraph::new`] has a parent (invariant #1).
    pub fn add_scope(&mut self, kind: ScopeKind, parent: Handle<Scope>, location: Location) -> Handle<Scope> {
        self.scopes.add(Scope::new(kind, Some(parent), location))
    }

    /// Sets a scope's simple and qualified name. Required before merge for any `kind.is_named()`
    /// scope (invariant #3's identity tuple reads `qualified_name`).
    pub fn name_scope(
        &mut self,
        scope: Handle<Scope>,
        simple_name: Handle<InternedString>,
        qualified_name: Handle<InternedString>,
    ) {
        let scope = &mut self.scopes[scope];
        scope.simple_name = Some(simple_name);
        scope.qualified_name = Some(qualified_name);
    }

    pub fn set_scope_signature(&mut self, scope: Handle<Scope>, signature: Handle<InternedString>) {
        self.scopes[scope].signature = Some(signature);
    }

    pub fn set_scope_language(&mut self, scope: Handle<Scope>, language: Language) {
        self.scopes[scope].language = Some(language);
    }

    /// Appends a statement to `owning_scope`'s body. Pass a [`StatementKind::Scope`] to introduce a
    /// nested child scope at this position.
    pub fn add_statement(
        &mut self,
        owning_scope: Handle<Scope>,
        kind: StatementKind,
        location: Location,
    ) -> Handle<Statement> {
        let statement = self.statements.add(Statement {
            kind,
            owning_scope,
            location,
        });
        self.scopes[owning_scope].statements.push(statement);
        statement
    }

    pub fn add_expression(&mut self, kind: ExpressionKind, location: Location) -> Handle<Expression> {
        self.expressions.add(Expression { kind, location })
    }

    pub fn add_declaration(
        &mut self,
        owning_scope: Handle<Scope>,
        name: Handle<InternedString>,
        declared_type: Option<Handle<Expression>>,
        initializer: Option<Handle<Expression>>,
        location: Location,
    ) -> Handle<VariableDeclaration> {
        let declaration = self.declarations.add(VariableDeclaration {
            name,
            declared_type,
            initializer,
            location,
            owning_scope,
        });
        self.scopes[owning_scope].declarations.push(declaration);
        declaration
    }

    pub fn add_method_call(
        &mut self,
        owning_scope: Handle<Scope>,
        name: Handle<InternedString>,
        arguments: Vec<Handle<Expression>>,
        resolved_target_hint: Option<Handle<InternedString>>,
        location: Location,
    ) -> Handle<MethodCall> {
        let call = self.method_calls.add(MethodCall {
            name,
            arguments,
            resolved_target_hint,
            location,
            owning_scope,
        });
        self.scopes[owning_scope].method_calls.push(call);
        call
    }
}

/// Returns whether `candidate` is `query` or a path-segment-aligned prefix of it.
fn is_xpath_prefix(candidate: &str, query: &str) -> bool {
    if candidate == query {
        return true;
    }
    query
        .strip_prefix(candidate)
        .map(|rest| rest.starts_with('/'))
        .unwrap_or(false)
}
