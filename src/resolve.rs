// ------------------------------------------------------------------------------------------------
// Copyright © 2021, stack-graphs authors.
// Licensed under either of Apache License, Version 2.0, or MIT license, at your option.
// Please see the LICENSE-APACHE or LICENSE-MIT files in this distribution for license details.
// ------------------------------------------------------------------------------------------------

//! Name resolution (C3), spec.md §4.3's `FindMatches`.
//!
//! `find_matches` takes a `NameUse` expression plus the scope and statement it was found in
//! (callers always have this context from navigating down to the expression; see the design note
//! on [`crate::graph::Expression`]) and returns its candidates in the spec's order: keyword
//! short-circuit, qualified/dotted-chain resolution, lexical ancestor walk, then imports and
//! aliases.

use crate::arena::Handle;
use crate::error::RepositoryError;
use crate::graph::{
    Expression, ExpressionKind, Language, NamedEntity, Scope, ScopeGraph, ScopeKindFilter,
    Statement, StatementKind,
};

/// `FindMatches(nameUse)`. `scope` is the `NameUse`'s enclosing scope and `statement` is the
/// statement it occurs in; `statement` is `None` only for a `NameUse` with no syntactic parent
/// statement (e.g. one reached by constructing an `Expression` handle directly rather than by
/// walking down from a scope), which the spec defines as unresolvable.
pub fn find_matches(
    graph: &ScopeGraph,
    name_use: Handle<Expression>,
    scope: Handle<Scope>,
    statement: Option<Handle<Statement>>,
) -> Result<Vec<NamedEntity>, RepositoryError> {
    let statement = statement.ok_or(RepositoryError::Resolution)?;
    let (name, prefix) = match &graph.expression(name_use).kind {
        ExpressionKind::NameUse { name, prefix } => (*name, prefix.clone()),
        _ => {
            return Err(RepositoryError::Argument(
                "find_matches requires a NameUse expression".to_string(),
            ))
        }
    };
    let name_text = graph.resolve_string(name).to_string();

    if prefix.is_empty() {
        return Ok(resolve_single_segment(graph, scope, statement, &name_text));
    }

    let prefix_texts: Vec<String> = prefix
        .iter()
        .map(|&h| graph.resolve_string(h).to_string())
        .collect();
    Ok(resolve_qualified_chain(
        graph,
        scope,
        statement,
        &prefix_texts,
        &name_text,
    ))
}

/// Step 1: `this`/`base`/`super` resolve without consulting lexical scope or imports at all.
/// `this` is the nearest enclosing `TypeDefinition`; `base` (C#) and `super` (Java) are that
/// type's nearest enclosing `TypeDefinition` in turn. The underlying scope graph has no explicit
/// inheritance edge (extracting a type's supertype is out of scope here, see DESIGN.md), so
/// "parent type" is approximated as lexical nesting: the next `TypeDefinition` out.
fn keyword_shortcut(graph: &ScopeGraph, scope: Handle<Scope>, name: &str) -> Option<Handle<Scope>> {
    match name {
        "this" => graph.ancestors_and_self(scope, ScopeKindFilter::Type).next(),
        "base" if enclosing_language(graph, scope) == Some(Language::CSharp) => {
            let mut types = graph.ancestors_and_self(scope, ScopeKindFilter::Type);
            types.next()?;
            types.next()
        }
        "super" if enclosing_language(graph, scope) == Some(Language::Java) => {
            let mut types = graph.ancestors_and_self(scope, ScopeKindFilter::Type);
            types.next()?;
            types.next()
        }
        _ => None,
    }
}

/// The language tag of the nearest ancestor (inclusive) that carries one. Scopes contributed by a
/// file pick up that file's language at merge time (see `merge::Merger::merge_scope`); scopes with
/// no direct contribution (mid-merge placeholders) fall through to their parent's.
fn enclosing_language(graph: &ScopeGraph, scope: Handle<Scope>) -> Option<Language> {
    graph
        .ancestors_and_self(scope, ScopeKindFilter::Any)
        .find_map(|s| graph.scope(s).language)
}

/// Resolves a single bare name segment: either a keyword, or a full lexical-then-import-then-alias
/// search (steps 1, 4 and 5). Used both for a prefix-free `NameUse` and for the leading segment of
/// a qualified chain (so `this.f` resolves `this` here before chaining into `f`).
fn resolve_single_segment(
    graph: &ScopeGraph,
    scope: Handle<Scope>,
    statement: Handle<Statement>,
    name: &str,
) -> Vec<NamedEntity> {
    if let Some(hit) = keyword_shortcut(graph, scope, name) {
        return vec![NamedEntity::Scope(hit)];
    }
    resolve_lexical_and_imports(graph, scope, statement, name)
}

/// Steps 2/3: a qualified name (`A.B.C`) or dotted chain (`expr.C`). The graph's `NameUse` already
/// flattens a chain of plain-name segments into a single node's `prefix`, so qualified and dotted
/// resolution collapse into the same left-to-right chaining here: resolve the first segment as an
/// ordinary single-segment lookup, then narrow to named children at each following segment,
/// finally collecting `INamedEntity` matches of the last segment within whatever containers
/// remain.
fn resolve_qualified_chain(
    graph: &ScopeGraph,
    scope: Handle<Scope>,
    statement: Handle<Statement>,
    prefix_texts: &[String],
    final_name: &str,
) -> Vec<NamedEntity> {
    let mut containers: Vec<Handle<Scope>> = resolve_single_segment(graph, scope, statement, &prefix_texts[0])
        .into_iter()
        .filter_map(only_scope)
        .collect();

    for segment in &prefix_texts[1..] {
        containers = containers
            .iter()
            .flat_map(|&c| graph.named_children(c, segment, ScopeKindFilter::AnyNamed))
            .collect();
    }

    containers
        .iter()
        .flat_map(|&c| graph.named_entities(c, final_name))
        .collect()
}

/// Steps 4 and 5, in the spec's stated order: nearer lexical scopes first, then imports, then
/// aliases.
fn resolve_lexical_and_imports(
    graph: &ScopeGraph,
    scope: Handle<Scope>,
    statement: Handle<Statement>,
    name: &str,
) -> Vec<NamedEntity> {
    let mut results: Vec<NamedEntity> = Vec::new();
    for ancestor in graph.ancestors_and_self(scope, ScopeKindFilter::Any) {
        results.extend(graph.named_entities(ancestor, name));
    }

    let mut import_hits = Vec::new();
    let mut alias_hits = Vec::new();
    let mut current_scope = scope;
    let mut current_statement = Some(statement);
    while let Some(stmt) = current_statement {
        for sibling in graph.siblings_before(stmt) {
            match &graph.statement(sibling).kind {
                StatementKind::Import { imported_namespace } => {
                    let expr = *imported_namespace;
                    for container in resolve_path_to_scopes(graph, expr, current_scope, sibling) {
                        import_hits.extend(graph.named_entities(container, name));
                    }
                }
                StatementKind::Alias { target, alias_name } => {
                    if graph.resolve_string(*alias_name) == name {
                        let expr = *target;
                        alias_hits.extend(resolve_path_to_entities(graph, expr, current_scope, sibling));
                    }
                }
                _ => {}
            }
        }
        current_statement = graph.enclosing_statement_of(current_scope);
        if let Some(next_stmt) = current_statement {
            current_scope = graph.statement(next_stmt).owning_scope();
        }
    }

    results.extend(import_hits);
    results.extend(alias_hits);
    results
}

/// Resolves an arbitrary path expression (an import's namespace, or an alias's target) to the
/// `NamedEntity` candidates it denotes, by re-running the same single-segment/qualified-chain
/// machinery `find_matches` uses for an ordinary `NameUse`.
fn resolve_path_to_entities(
    graph: &ScopeGraph,
    expr: Handle<Expression>,
    scope: Handle<Scope>,
    statement: Handle<Statement>,
) -> Vec<NamedEntity> {
    match &graph.expression(expr).kind {
        ExpressionKind::NameUse { name, prefix } => {
            let name_text = graph.resolve_string(*name).to_string();
            if prefix.is_empty() {
                resolve_single_segment(graph, scope, statement, &name_text)
            } else {
                let prefix_texts: Vec<String> = prefix
                    .iter()
                    .map(|&h| graph.resolve_string(h).to_string())
                    .collect();
                resolve_qualified_chain(graph, scope, statement, &prefix_texts, &name_text)
            }
        }
        ExpressionKind::TypeUse { name } => {
            let name_text = graph.resolve_string(*name).to_string();
            resolve_single_segment(graph, scope, statement, &name_text)
        }
        _ => Vec::new(),
    }
}

/// Like [`resolve_path_to_entities`] but narrowed to scopes, for contexts (import namespaces,
/// chain containers) that can only ever be a container, never a bare declaration.
fn resolve_path_to_scopes(
    graph: &ScopeGraph,
    expr: Handle<Expression>,
    scope: Handle<Scope>,
    statement: Handle<Statement>,
) -> Vec<Handle<Scope>> {
    resolve_path_to_entities(graph, expr, scope, statement)
        .into_iter()
        .filter_map(only_scope)
        .collect()
}

fn only_scope(entity: NamedEntity) -> Option<Handle<Scope>> {
    match entity {
        NamedEntity::Scope(s) => Some(s),
        NamedEntity::Declaration(_) => None,
    }
}
