// ------------------------------------------------------------------------------------------------
// Copyright © 2021, stack-graphs authors.
// Licensed under either of Apache License, Version 2.0, or MIT license, at your option.
// Please see the LICENSE-APACHE or LICENSE-MIT files in this distribution for license details.
// ------------------------------------------------------------------------------------------------

//! The merge algebra (C2): folding a freshly parsed, unmerged scope tree into the global graph,
//! and stripping a file's contributions back out again.
//!
//! Per Open Question #3, merge here is **move with absorption**: the surviving `NamedScope` is
//! mutated in place and the incoming node's locations/children are drained into it. This is
//! O(size) rather than the O(size²) a deep-copy-then-diff approach would cost, and it preserves
//! reference identity for any outstanding query that is running lock-free against a snapshot of
//! handles (see `lock::ScopeLock`).

use std::path::Path;

use fxhash::FxHashMap;

use crate::arena::Handle;
use crate::graph::{
    ControlFlowKind, Expression, ExpressionKind, InternedString, Language, MethodCall, Scope,
    ScopeGraph, ScopeIdentity, Statement, StatementKind, VariableDeclaration,
};
use crate::location::Location;

/// Merges `incoming` — a freshly parsed, unmerged scope tree rooted at a `Program`-surrogate
/// (spec.md §4.4) — into `global`. `incoming`'s own root is discarded; its direct contents become
/// part of `global`'s single `Program` node (invariant #1).
///
/// Implements spec.md §4.2's five rules: `NamedScope`s matching by `(kind, qualified name,
/// signature)` coalesce (rule 1); anything else becomes a sibling (rule 2); `VariableDeclaration`s
/// and `MethodCall`s are never coalesced (rules 3, 4); `ExternStatement` bodies are transparent to
/// name matching but retained for round-tripping (rule 5).
pub fn merge_file(global: &mut ScopeGraph, incoming: &ScopeGraph, language: Language) {
    let mut merger = Merger {
        global,
        incoming,
        language,
        expr_map: FxHashMap::default(),
        call_map: FxHashMap::default(),
    };
    let incoming_root = incoming.program();
    let global_root = merger.global.program();
    merger.merge_statements_into(incoming_root, global_root);
}

/// Handles extracted from an [`ExpressionKind`] before any recursive, `self`-mutating translation
/// begins (see [`Merger::translate_expression`]).
enum ExtractedExpr {
    NameUse(Handle<InternedString>, Vec<Handle<InternedString>>),
    OperatorUse(Handle<InternedString>),
    MethodCall(Handle<MethodCall>),
    LiteralUse(Handle<InternedString>),
    TypeUse(Handle<InternedString>),
}

/// Handles extracted from a non-`Scope` [`StatementKind`] before any recursive, `self`-mutating
/// translation begins (see [`Merger::translate_nonscope_statement`]).
enum NonScope {
    Import(Handle<Expression>),
    Alias(Handle<Expression>, Handle<InternedString>),
    Extern(Handle<InternedString>, Vec<Handle<Statement>>),
    ControlFlow(ControlFlowKind, Vec<Handle<Expression>>),
    Call(Handle<MethodCall>),
    Generic(Vec<Handle<Expression>>),
}

struct Merger<'g, 'i> {
    global: &'g mut ScopeGraph,
    incoming: &'i ScopeGraph,
    language: Language,
    expr_map: FxHashMap<Handle<Expression>, Handle<Expression>>,
    call_map: FxHashMap<Handle<MethodCall>, Handle<MethodCall>>,
}

impl Merger<'_, '_> {
    fn intern(&mut self, handle: Handle<InternedString>) -> Handle<InternedString> {
        let text = self.incoming.resolve_string(handle);
        self.global.strings.intern(text)
    }

    fn intern_opt(&mut self, handle: Option<Handle<InternedString>>) -> Option<Handle<InternedString>> {
        handle.map(|h| self.intern(h))
    }

    /// Folds every declaration, method call, and statement owned by `incoming_scope` into
    /// `target_scope`, recursing into nested scopes (coalescing or creating them) along the way.
    fn merge_statements_into(&mut self, incoming_scope: Handle<Scope>, target_scope: Handle<Scope>) {
        let declarations = self.incoming.scope(incoming_scope).declarations().to_vec();
        for decl in declarations {
            let translated = self.translate_declaration(decl, target_scope);
            insert_declaration_sorted(self.global, target_scope, translated);
        }
        let method_calls = self.incoming.scope(incoming_scope).method_calls().to_vec();
        for call in method_calls {
            let translated = self.translate_method_call(call, target_scope);
            insert_method_call_sorted(self.global, target_scope, translated);
        }
        let statements = self.incoming.scope(incoming_scope).statements().to_vec();
        for stmt in statements {
            self.merge_statement(stmt, target_scope);
        }
    }

    fn merge_statement(&mut self, incoming_stmt: Handle<Statement>, target_scope: Handle<Scope>) {
        let location = self.incoming.statement(incoming_stmt).location.clone();
        let scope_child = match &self.incoming.statement(incoming_stmt).kind {
            StatementKind::Scope(child) => Some(*child),
            _ => None,
        };
        if let Some(child) = scope_child {
            if let Some(target_stmt) = self.make_scope_statement(child, target_scope, location) {
                insert_statement_sorted(self.global, target_scope, target_stmt);
            }
            return;
        }
        let target_stmt = self.translate_nonscope_statement(incoming_stmt, target_scope);
        insert_statement_sorted(self.global, target_scope, target_stmt);
    }

    /// Merges a nested `NamedScope`/`Block` referenced by a `Statement::Scope`, returning a fresh
    /// wrapper `Statement` to place among `target_scope`'s children — unless that child already
    /// has a wrapper there from an earlier file, in which case `None` (the new location was
    /// already folded into the coalesced scope by [`merge_scope`]).
    fn make_scope_statement(
        &mut self,
        child: Handle<Scope>,
        target_scope: Handle<Scope>,
        location: Location,
    ) -> Option<Handle<Statement>> {
        let (target_child, is_new) = self.merge_scope(child, target_scope, location.clone());
        if !is_new && self.global.children_of(target_scope).any(|c| c == target_child) {
            return None;
        }
        Some(self.global.statements.add(Statement {
            kind: StatementKind::Scope(target_child),
            owning_scope: target_scope,
            location,
        }))
    }

    /// Coalesces (rule 1) or creates (rule 2) the global counterpart of `incoming_scope`, and
    /// recursively folds its contents in either case. Returns the target handle and whether it
    /// was freshly created.
    fn merge_scope(
        &mut self,
        incoming_scope: Handle<Scope>,
        parent: Handle<Scope>,
        location: Location,
    ) -> (Handle<Scope>, bool) {
        let kind = self.incoming.scope(incoming_scope).kind;
        let simple_name = self.incoming.scope(incoming_scope).simple_name;
        let qualified_name = self.incoming.scope(incoming_scope).qualified_name;
        let signature = self.incoming.scope(incoming_scope).signature;

        let simple_name = self.intern_opt(simple_name);
        let qualified_name = self.intern_opt(qualified_name);
        let signature = self.intern_opt(signature);

        if kind.is_named() {
            if let Some(qn) = qualified_name {
                let qn_text = self.global.resolve_string(qn).to_string();
                let sig_text = signature.map(|s| self.global.resolve_string(s).to_string());
                let identity: ScopeIdentity = (kind, qn_text, sig_text);
                if let Some(&existing) = self.global.identity_index.get(&identity) {
                    self.global.scopes[existing].locations.push(location);
                    self.merge_statements_into(incoming_scope, existing);
                    return (existing, false);
                }
                let mut scope = Scope::new(kind, Some(parent), location);
                scope.simple_name = simple_name;
                scope.qualified_name = Some(qn);
                scope.signature = signature;
                scope.language = Some(self.language);
                let handle = self.global.scopes.add(scope);
                self.global.identity_index.insert(identity, handle);
                self.merge_statements_into(incoming_scope, handle);
                return (handle, true);
            }
        }

        // Block, or a NamedScope the parser left anonymous: never coalesced (rule 2).
        let mut scope = Scope::new(kind, Some(parent), location);
        scope.simple_name = simple_name;
        scope.qualified_name = qualified_name;
        scope.signature = signature;
        scope.language = Some(self.language);
        let handle = self.global.scopes.add(scope);
        self.merge_statements_into(incoming_scope, handle);
        (handle, true)
    }

    fn translate_nonscope_statement(
        &mut self,
        incoming_stmt: Handle<Statement>,
        target_scope: Handle<Scope>,
    ) -> Handle<Statement> {
        let location = self.incoming.statement(incoming_stmt).location.clone();
        // Extract the handles we need out of `incoming` first, ending the borrow of
        // `self.incoming` before recursing into `self` mutably below.
        let extracted = match &self.incoming.statement(incoming_stmt).kind {
            StatementKind::Scope(_) => unreachable!("scope statements are handled by merge_statement"),
            StatementKind::Import { imported_namespace } => NonScope::Import(*imported_namespace),
            StatementKind::Alias { target, alias_name } => NonScope::Alias(*target, *alias_name),
            StatementKind::Extern { linkage, body } => NonScope::Extern(*linkage, body.clone()),
            StatementKind::ControlFlow { tag, children } => NonScope::ControlFlow(*tag, children.clone()),
            StatementKind::Call(call) => NonScope::Call(*call),
            StatementKind::Generic { expressions } => NonScope::Generic(expressions.clone()),
        };
        let kind = match extracted {
            NonScope::Import(imported_namespace) => StatementKind::Import {
                imported_namespace: self.translate_expression(imported_namespace, target_scope),
            },
            NonScope::Alias(target, alias_name) => StatementKind::Alias {
                target: self.translate_expression(target, target_scope),
                alias_name: self.intern(alias_name),
            },
            NonScope::Extern(linkage, body) => {
                let linkage = self.intern(linkage);
                let body = body
                    .into_iter()
                    .filter_map(|s| self.translate_extern_body_statement(s, target_scope))
                    .collect();
                StatementKind::Extern { linkage, body }
            }
            NonScope::ControlFlow(tag, children) => StatementKind::ControlFlow {
                tag,
                children: children
                    .into_iter()
                    .map(|e| self.translate_expression(e, target_scope))
                    .collect(),
            },
            NonScope::Call(call) => StatementKind::Call(self.translate_method_call(call, target_scope)),
            NonScope::Generic(expressions) => StatementKind::Generic {
                expressions: expressions
                    .into_iter()
                    .map(|e| self.translate_expression(e, target_scope))
                    .collect(),
            },
        };
        self.global.statements.add(Statement {
            kind,
            owning_scope: target_scope,
            location,
        })
    }

    /// A body entry of an `ExternStatement` (merge rule 5: transparent for name matching, but
    /// kept for round-tripping). Nested scopes merge directly into `target_scope`'s namespace,
    /// not into a wrapper scope for the extern block itself.
    fn translate_extern_body_statement(
        &mut self,
        incoming_stmt: Handle<Statement>,
        target_scope: Handle<Scope>,
    ) -> Option<Handle<Statement>> {
        let location = self.incoming.statement(incoming_stmt).location.clone();
        let scope_child = match &self.incoming.statement(incoming_stmt).kind {
            StatementKind::Scope(child) => Some(*child),
            _ => None,
        };
        if let Some(child) = scope_child {
            return self.make_scope_statement(child, target_scope, location);
        }
        Some(self.translate_nonscope_statement(incoming_stmt, target_scope))
    }

    fn translate_declaration(
        &mut self,
        handle: Handle<VariableDeclaration>,
        owning_scope: Handle<Scope>,
    ) -> Handle<VariableDeclaration> {
        let decl = self.incoming.declaration(handle);
        let name = decl.name;
        let declared_type = decl.declared_type;
        let initializer = decl.initializer;
        let location = decl.location.clone();
        let name = self.intern(name);
        let declared_type = declared_type.map(|e| self.translate_expression(e, owning_scope));
        let initializer = initializer.map(|e| self.translate_expression(e, owning_scope));
        self.global.declarations.add(VariableDeclaration {
            name,
            declared_type,
            initializer,
            location,
            owning_scope,
        })
    }

    fn translate_method_call(&mut self, handle: Handle<MethodCall>, owning_scope: Handle<Scope>) -> Handle<MethodCall> {
        if let Some(&existing) = self.call_map.get(&handle) {
            return existing;
        }
        let call = self.incoming.method_call(handle);
        let name = call.name;
        let arguments = call.arguments.clone();
        let resolved_target_hint = call.resolved_target_hint;
        let location = call.location.clone();
        let name = self.intern(name);
        let arguments = arguments
            .into_iter()
            .map(|e| self.translate_expression(e, owning_scope))
            .collect();
        let resolved_target_hint = resolved_target_hint.map(|h| self.intern(h));
        let target = self.global.method_calls.add(MethodCall {
            name,
            arguments,
            resolved_target_hint,
            location,
            owning_scope,
        });
        self.call_map.insert(handle, target);
        target
    }

    fn translate_expression(&mut self, handle: Handle<Expression>, owning_scope: Handle<Scope>) -> Handle<Expression> {
        if let Some(&existing) = self.expr_map.get(&handle) {
            return existing;
        }
        let location = self.incoming.expression(handle).location.clone();
        let extracted = match &self.incoming.expression(handle).kind {
            ExpressionKind::NameUse { name, prefix } => ExtractedExpr::NameUse(*name, prefix.clone()),
            ExpressionKind::OperatorUse { text } => ExtractedExpr::OperatorUse(*text),
            ExpressionKind::MethodCall(call) => ExtractedExpr::MethodCall(*call),
            ExpressionKind::LiteralUse { text } => ExtractedExpr::LiteralUse(*text),
            ExpressionKind::TypeUse { name } => ExtractedExpr::TypeUse(*name),
        };
        let kind = match extracted {
            ExtractedExpr::NameUse(name, prefix) => ExpressionKind::NameUse {
                name: self.intern(name),
                prefix: prefix.into_iter().map(|p| self.intern(p)).collect(),
            },
            ExtractedExpr::OperatorUse(text) => ExpressionKind::OperatorUse { text: self.intern(text) },
            ExtractedExpr::MethodCall(call) => {
                ExpressionKind::MethodCall(self.translate_method_call(call, owning_scope))
            }
            ExtractedExpr::LiteralUse(text) => ExpressionKind::LiteralUse { text: self.intern(text) },
            ExtractedExpr::TypeUse(name) => ExpressionKind::TypeUse { name: self.intern(name) },
        };
        let target = self.global.expressions.add(Expression { kind, location });
        self.expr_map.insert(handle, target);
        target
    }
}

fn insert_statement_sorted(graph: &mut ScopeGraph, scope: Handle<Scope>, stmt: Handle<Statement>) {
    let loc = graph.statements[stmt].location.clone();
    let locs: Vec<Location> = graph.scopes[scope]
        .statements
        .iter()
        .map(|&h| graph.statements[h].location.clone())
        .collect();
    let idx = locs.partition_point(|l| *l <= loc);
    graph.scopes[scope].statements.insert(idx, stmt);
}

fn insert_declaration_sorted(graph: &mut ScopeGraph, scope: Handle<Scope>, decl: Handle<VariableDeclaration>) {
    let loc = graph.declarations[decl].location.clone();
    let locs: Vec<Location> = graph.scopes[scope]
        .declarations
        .iter()
        .map(|&h| graph.declarations[h].location.clone())
        .collect();
    let idx = locs.partition_point(|l| *l <= loc);
    graph.scopes[scope].declarations.insert(idx, decl);
}

fn insert_method_call_sorted(graph: &mut ScopeGraph, scope: Handle<Scope>, call: Handle<MethodCall>) {
    let loc = graph.method_calls[call].location.clone();
    let locs: Vec<Location> = graph.scopes[scope]
        .method_calls
        .iter()
        .map(|&h| graph.method_calls[h].location.clone())
        .collect();
    let idx = locs.partition_point(|l| *l <= loc);
    graph.scopes[scope].method_calls.insert(idx, call);
}

/// `RemoveFile(path)`: a depth-first visit that strips `path` from every node's location set.
/// A `Scope` whose location set becomes empty is deleted; its surviving children are promoted
/// into its parent at the position it occupied. Statements, declarations, and method calls carry
/// only a single location each, so a match deletes the node outright rather than shrinking a set.
pub fn remove_file(graph: &mut ScopeGraph, file: &Path) {
    let program = graph.program();
    remove_file_from_scope(graph, program, file);
}

fn remove_file_from_scope(graph: &mut ScopeGraph, scope: Handle<Scope>, file: &Path) {
    let old_statements = std::mem::take(&mut graph.scopes[scope].statements);
    let mut new_statements = Vec::with_capacity(old_statements.len());
    for stmt in old_statements {
        let is_from_file = graph.statements[stmt].location.file == file;
        let scope_child = match &graph.statements[stmt].kind {
            StatementKind::Scope(child) => Some(*child),
            _ => None,
        };
        if let Some(child) = scope_child {
            // Recurse first so that the child's own contributions from `file` (nested statements,
            // declarations, method calls) are stripped regardless of whether this particular
            // wrapper statement is the one that came from `file`. The scope's own location set is
            // stripped unconditionally too: a coalesced scope has only one wrapper statement (from
            // its first contributing file, see `make_scope_statement`), so a later file's location
            // must be stripped here even when `stmt` itself isn't tagged with `file`.
            remove_file_from_scope(graph, child, file);
            graph.scopes[child].locations.retain(|l| l.file != file);
            if graph.scopes[child].locations.is_empty() {
                let removed = graph.scopes.remove(child).expect("child scope exists");
                if let Some(identity) = identity_of(graph, &removed) {
                    graph.identity_index.remove(&identity);
                }
                // Promoted statements (and any scope they wrap) moved out of `child` into `scope`;
                // re-parent them so a later traversal never indexes the now-tombstoned `child`.
                for &promoted in &removed.statements {
                    graph.statements[promoted].owning_scope = scope;
                    if let StatementKind::Scope(promoted_child) = graph.statements[promoted].kind {
                        graph.scopes[promoted_child].parent = Some(scope);
                    }
                }
                new_statements.extend(removed.statements);
                graph.statements.remove(stmt);
                continue;
            }
            new_statements.push(stmt);
            continue;
        }
        if is_from_file {
            strip_extern_body(graph, stmt, file);
            graph.statements.remove(stmt);
            continue;
        }
        new_statements.push(stmt);
    }
    graph.scopes[scope].statements = new_statements;

    let declarations = std::mem::take(&mut graph.scopes[scope].declarations);
    graph.scopes[scope].declarations = declarations
        .into_iter()
        .filter(|&d| {
            let keep = graph.declarations[d].location.file != file;
            if !keep {
                graph.declarations.remove(d);
            }
            keep
        })
        .collect();

    let method_calls = std::mem::take(&mut graph.scopes[scope].method_calls);
    graph.scopes[scope].method_calls = method_calls
        .into_iter()
        .filter(|&m| {
            let keep = graph.method_calls[m].location.file != file;
            if !keep {
                graph.method_calls.remove(m);
            }
            keep
        })
        .collect();
}

/// An `Extern` statement being removed wholesale (it was contributed entirely by `file`) still
/// needs its transparent body's nested scopes cleaned up, since those scopes may be shared with
/// (coalesced into) the enclosing namespace rather than owned solely by this statement.
fn strip_extern_body(graph: &mut ScopeGraph, extern_stmt: Handle<Statement>, file: &Path) {
    let body = match &graph.statements[extern_stmt].kind {
        StatementKind::Extern { body, .. } => body.clone(),
        _ => return,
    };
    for stmt in body {
        let scope_child = match &graph.statements[stmt].kind {
            StatementKind::Scope(child) => Some(*child),
            _ => None,
        };
        if let Some(child) = scope_child {
            graph.scopes[child].locations.retain(|l| l.file != file);
            if graph.scopes[child].locations.is_empty() {
                if let Some(removed) = graph.scopes.remove(child) {
                    if let Some(identity) = identity_of(graph, &removed) {
                        graph.identity_index.remove(&identity);
                    }
                }
            }
        }
        graph.statements.remove(stmt);
    }
}

fn identity_of(graph: &ScopeGraph, scope: &Scope) -> Option<ScopeIdentity> {
    if !scope.kind.is_named() {
        return None;
    }
    let qualified_name = graph.resolve_string(scope.qualified_name?).to_string();
    let signature = scope.signature.map(|h| graph.resolve_string(h).to_string());
    Some((scope.kind, qualified_name, signature))
}
