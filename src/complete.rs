// Copyright 2025 StrongDM Inc
// SPDX-License-Identifier: Apache-2.0

//! Cursor-aware autocomplete: context classification and suggestion
//! synthesis.
//!
//! The engine operates on possibly invalid input and never fails: the
//! clause scanner reports problems out-of-band, the where tokenizer runs in
//! lenient mode, and cursor positions are clamped into the query.
//!
//! Two stages: [`context`] classifies the cursor position, [`suggest`]
//! turns a context plus a schema into ranked, prefix-filtered suggestions.

use std::collections::HashSet;

use serde::Serialize;

use crate::ast::{CompareOp, Key};
use crate::lexer::{scan_clauses, skip_quoted, tokenize_where_lenient, ClauseScan, TokenKind};
use crate::schema::{starts_with_ci, Schema};

/// Classified cursor position within a query line.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CursorContext {
    TopLevel {
        partial: String,
        used_keys: Vec<Key>,
    },
    EntityValue {
        partial: String,
    },
    LimitValue {
        partial: String,
    },
    OrderValue {
        partial: String,
        entity_value: String,
        after_field: bool,
    },
    IncludeValue {
        partial: String,
        entity_value: String,
    },
    WhereField {
        partial: String,
        entity_value: String,
    },
    WhereValue {
        partial: String,
        field: String,
        op: CompareOp,
        entity_value: String,
    },
    Unknown {
        partial: String,
    },
}

impl CursorContext {
    /// The characters immediately before the cursor that a suggestion may
    /// replace.
    pub fn partial(&self) -> &str {
        match self {
            CursorContext::TopLevel { partial, .. }
            | CursorContext::EntityValue { partial }
            | CursorContext::LimitValue { partial }
            | CursorContext::OrderValue { partial, .. }
            | CursorContext::IncludeValue { partial, .. }
            | CursorContext::WhereField { partial, .. }
            | CursorContext::WhereValue { partial, .. }
            | CursorContext::Unknown { partial } => partial,
        }
    }
}

/// One autocomplete candidate.
///
/// When `replace_partial` is true, `replace_length` is the byte length of
/// the context's partial and the client splices
/// `text[0..cursor-replace_length] + insert_text + text[cursor..]`;
/// otherwise `replace_length` is zero and the client inserts at the cursor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Suggestion {
    pub label: String,
    pub insert_text: String,
    pub replace_partial: bool,
    pub replace_length: usize,
}

impl Suggestion {
    fn replacing(label: impl Into<String>, partial: &str) -> Self {
        let label = label.into();
        Suggestion {
            insert_text: label.clone(),
            label,
            replace_partial: true,
            replace_length: partial.len(),
        }
    }

    fn inserting(label: impl Into<String>) -> Self {
        let label = label.into();
        Suggestion {
            insert_text: label.clone(),
            label,
            replace_partial: false,
            replace_length: 0,
        }
    }
}

/// Classify the cursor position within a query.
///
/// Total: any cursor is clamped into the query and floored to a character
/// boundary, and malformed input never fails classification.
pub fn context(query: &str, cursor: usize) -> CursorContext {
    let mut cursor = cursor.min(query.len());
    while cursor > 0 && !query.is_char_boundary(cursor) {
        cursor -= 1;
    }

    // Used keys and the entity value come from the whole query, including
    // text beyond the cursor.
    let full_scan = scan_clauses(query);
    let used_keys = collect_used_keys(query, &full_scan);
    let entity_value = find_entity_value(query, &full_scan);

    let prefix = &query[..cursor];
    let prefix_scan = scan_clauses(prefix);
    let segment = match prefix_scan.clauses.last() {
        None => {
            return CursorContext::TopLevel {
                partial: String::new(),
                used_keys,
            }
        }
        // Cursor sits in whitespace after the last clause.
        Some(span) if span.end < cursor => {
            return CursorContext::TopLevel {
                partial: String::new(),
                used_keys,
            }
        }
        Some(span) => &prefix[span.start..],
    };

    classify_segment(segment, used_keys, entity_value)
}

/// Produce ranked suggestions for a classified cursor context. Total.
pub fn suggest(ctx: &CursorContext, schema: &Schema) -> Vec<Suggestion> {
    let suggestions = match ctx {
        CursorContext::TopLevel { partial, used_keys } => {
            top_level_suggestions(partial, used_keys)
        }
        CursorContext::EntityValue { partial } => {
            let mut seen = HashSet::new();
            let mut out = Vec::new();
            for entity in &schema.entities {
                push_match(&mut out, &mut seen, &entity.name, partial);
            }
            out
        }
        // Limits are free-form numbers; there is nothing to offer.
        CursorContext::LimitValue { .. } => Vec::new(),
        CursorContext::IncludeValue {
            partial,
            entity_value,
        } => {
            let mut seen = HashSet::new();
            let mut out = Vec::new();
            for entity in schema.relevant_entities(entity_value) {
                for relation in &entity.relations {
                    push_match(&mut out, &mut seen, relation, partial);
                }
            }
            out
        }
        CursorContext::OrderValue {
            partial,
            entity_value,
            after_field,
        } => {
            let mut seen = HashSet::new();
            let mut out = Vec::new();
            for entity in schema.relevant_entities(entity_value) {
                for field in entity.fields.keys() {
                    push_match(&mut out, &mut seen, field, partial);
                }
            }
            if *after_field {
                push_match(&mut out, &mut seen, "asc", partial);
                push_match(&mut out, &mut seen, "desc", partial);
            }
            out
        }
        CursorContext::WhereField {
            partial,
            entity_value,
        } => where_field_suggestions(partial, entity_value, schema),
        CursorContext::WhereValue {
            partial,
            field,
            entity_value,
            ..
        } => {
            let mut seen = HashSet::new();
            let mut out = Vec::new();
            for entity in schema.relevant_entities(entity_value) {
                for (name, def) in entity.fields.iter() {
                    if !name.eq_ignore_ascii_case(field) {
                        continue;
                    }
                    if let Some(values) = &def.values {
                        for value in values {
                            push_match(&mut out, &mut seen, value, partial);
                        }
                    }
                }
            }
            out
        }
        CursorContext::Unknown { .. } => Vec::new(),
    };
    tracing::trace!(count = suggestions.len(), "built suggestions");
    suggestions
}

/// Classify the cursor and produce suggestions in one call.
pub fn suggest_at(query: &str, cursor: usize, schema: &Schema) -> Vec<Suggestion> {
    suggest(&context(query, cursor), schema)
}

fn collect_used_keys(query: &str, scan: &ClauseScan) -> Vec<Key> {
    let mut keys = Vec::new();
    for span in &scan.clauses {
        let clause = &query[span.start..span.end];
        if let Some((raw_key, _)) = clause.split_once(':') {
            if let Some(key) = Key::from_str(raw_key) {
                if !keys.contains(&key) {
                    keys.push(key);
                }
            }
        }
    }
    keys
}

/// First `entity:` value in the query, trimmed.
fn find_entity_value(query: &str, scan: &ClauseScan) -> String {
    for span in &scan.clauses {
        let clause = &query[span.start..span.end];
        if let Some((raw_key, value)) = clause.split_once(':') {
            if Key::from_str(raw_key) == Some(Key::Entity) {
                return value.trim().to_string();
            }
        }
    }
    String::new()
}

fn classify_segment(segment: &str, used_keys: Vec<Key>, entity_value: String) -> CursorContext {
    if segment.is_empty() {
        return CursorContext::TopLevel {
            partial: String::new(),
            used_keys,
        };
    }
    let (raw_key, value) = match segment.split_once(':') {
        None => {
            return CursorContext::TopLevel {
                partial: segment.to_string(),
                used_keys,
            }
        }
        Some(parts) => parts,
    };
    let key = match Key::from_str(raw_key) {
        None => {
            return CursorContext::Unknown {
                partial: value.to_string(),
            }
        }
        Some(key) => key,
    };
    match key {
        Key::Entity => CursorContext::EntityValue {
            partial: value.to_string(),
        },
        Key::Limit => CursorContext::LimitValue {
            partial: value.trim().to_string(),
        },
        Key::Order => classify_order_value(value, used_keys, entity_value),
        Key::Include => {
            let term = value.rsplit(',').next().unwrap_or(value);
            CursorContext::IncludeValue {
                partial: term.trim().to_string(),
                entity_value,
            }
        }
        Key::Where => {
            // Cursor sitting right after a completed block belongs to the
            // top level again.
            if where_block_complete(value) {
                return CursorContext::TopLevel {
                    partial: String::new(),
                    used_keys,
                };
            }
            classify_where_value(value, entity_value)
        }
    }
}

fn ends_in_space(s: &str) -> bool {
    matches!(s.as_bytes().last(), Some(b' ' | b'\t' | b'\r' | b'\n'))
}

fn classify_order_value(value: &str, used_keys: Vec<Key>, entity_value: String) -> CursorContext {
    // A space right after `order:` means the user moved on without typing
    // a field yet.
    if value.trim().is_empty() && ends_in_space(value) {
        return CursorContext::TopLevel {
            partial: String::new(),
            used_keys,
        };
    }
    let term = value.rsplit(',').next().unwrap_or(value);
    if ends_in_space(term) && !term.trim().is_empty() {
        return CursorContext::OrderValue {
            partial: String::new(),
            entity_value,
            after_field: true,
        };
    }
    let partial = term
        .split_ascii_whitespace()
        .last()
        .unwrap_or("")
        .to_string();
    CursorContext::OrderValue {
        partial,
        entity_value,
        after_field: false,
    }
}

/// True when the where value is a parenthesized block whose opening paren
/// is matched by its final character.
fn where_block_complete(value: &str) -> bool {
    let bytes = value.as_bytes();
    if bytes.first() != Some(&b'(') {
        return false;
    }
    let mut depth = 0i32;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'(' => {
                depth += 1;
                i += 1;
            }
            b')' => {
                depth -= 1;
                i += 1;
                if depth == 0 {
                    return i == bytes.len();
                }
            }
            b'"' => i = skip_quoted(bytes, i).unwrap_or(bytes.len()),
            _ => i += 1,
        }
    }
    false
}

fn paren_depth(s: &str) -> i32 {
    let bytes = s.as_bytes();
    let mut depth = 0i32;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'(' => {
                depth += 1;
                i += 1;
            }
            b')' => {
                depth -= 1;
                i += 1;
            }
            b'"' => i = skip_quoted(bytes, i).unwrap_or(bytes.len()),
            _ => i += 1,
        }
    }
    depth
}

fn classify_where_value(value: &str, entity_value: String) -> CursorContext {
    let mut inner = value.strip_prefix('(').unwrap_or(value);
    // A dangling close paren right before the cursor is noise for
    // classification.
    if inner.ends_with(')') && paren_depth(inner) < 0 {
        inner = &inner[..inner.len() - 1];
    }
    let tokens = tokenize_where_lenient(inner);

    let last = match tokens.last() {
        None => {
            return CursorContext::WhereField {
                partial: String::new(),
                entity_value,
            }
        }
        Some(token) => token,
    };
    let prev = tokens.len().checked_sub(2).and_then(|i| tokens.get(i));
    let prev_prev = tokens.len().checked_sub(3).and_then(|i| tokens.get(i));

    match last.kind {
        TokenKind::Op(op) => {
            let field = prev.map(|t| t.text.clone()).unwrap_or_default();
            CursorContext::WhereValue {
                partial: String::new(),
                field,
                op,
                entity_value,
            }
        }
        TokenKind::LParen | TokenKind::RParen | TokenKind::And | TokenKind::Or => {
            CursorContext::WhereField {
                partial: String::new(),
                entity_value,
            }
        }
        TokenKind::Str | TokenKind::Ident | TokenKind::Number | TokenKind::Bool => {
            if let Some(TokenKind::Op(op)) = prev.map(|t| t.kind) {
                let field = prev_prev.map(|t| t.text.clone()).unwrap_or_default();
                CursorContext::WhereValue {
                    partial: last.text.clone(),
                    field,
                    op,
                    entity_value,
                }
            } else {
                CursorContext::WhereField {
                    partial: last.text.clone(),
                    entity_value,
                }
            }
        }
    }
}

fn top_level_suggestions(partial: &str, used_keys: &[Key]) -> Vec<Suggestion> {
    Key::all()
        .iter()
        .filter(|key| !used_keys.contains(key))
        .map(|key| key.clause_label())
        .filter(|label| starts_with_ci(label, partial))
        .map(|label| Suggestion::replacing(label, partial))
        .collect()
}

fn where_field_suggestions(partial: &str, entity_value: &str, schema: &Schema) -> Vec<Suggestion> {
    let mut seen = HashSet::new();
    let mut names: Vec<&str> = Vec::new();
    for entity in schema.relevant_entities(entity_value) {
        for field in entity.fields.keys() {
            if seen.insert(field) {
                names.push(field);
            }
        }
    }
    // An exactly-typed field name switches the offer to operators, inserted
    // after the field rather than replacing it.
    if names.iter().any(|name| *name == partial) {
        return CompareOp::all()
            .iter()
            .map(|op| Suggestion::inserting(op.as_str()))
            .collect();
    }
    names
        .into_iter()
        .filter(|name| starts_with_ci(name, partial))
        .map(|name| Suggestion::replacing(name, partial))
        .collect()
}

fn push_match(out: &mut Vec<Suggestion>, seen: &mut HashSet<String>, label: &str, partial: &str) {
    if !starts_with_ci(label, partial) {
        return;
    }
    if !seen.insert(label.to_string()) {
        return;
    }
    out.push(Suggestion::replacing(label, partial));
}
