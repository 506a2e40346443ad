// Copyright 2025 StrongDM Inc
// SPDX-License-Identifier: Apache-2.0

//! RQL parser: top-level clause interpretation, the where-expression
//! grammar, and schema validation.
//!
//! Grammar for where expressions:
//!   or_expr    = and_expr { "or" and_expr } ;
//!   and_expr   = primary { [ "and" ] primary } ;   (adjacency is implicit AND)
//!   primary    = "(" or_expr ")" | comparison ;
//!   comparison = field [ operator ] value ;        (operator defaults to "=")

use regex::Regex;

use crate::ast::{CompareOp, Condition, Key, OrderDir, OrderTerm, Query, Value};
use crate::error::ParseError;
use crate::lexer::{scan_clauses, skip_quoted, tokenize_where, Token, TokenKind};
use crate::schema::{EntityDef, OrderedMap, Schema};

/// Parse an RQL query string into a query tree.
pub fn parse(input: &str) -> Result<Query, ParseError> {
    let scan = scan_clauses(input);
    if let Some(issue) = scan.issue {
        return Err(issue.to_parse_error());
    }

    let mut query = Query::default();
    let mut seen: Vec<Key> = Vec::new();
    for span in &scan.clauses {
        let clause = &input[span.start..span.end];
        let (raw_key, value) = clause.split_once(':').ok_or_else(|| {
            ParseError::new(format!("Invalid clause \"{clause}\": expected key:value"))
        })?;
        let key = Key::from_str(raw_key)
            .ok_or_else(|| ParseError::new(format!("Unknown top-level key: \"{raw_key}\"")))?;
        if seen.contains(&key) {
            return Err(ParseError::new(format!(
                "Duplicate top-level key: {}",
                key.as_str()
            )));
        }
        seen.push(key);

        match key {
            Key::Entity => {
                if value.is_empty() {
                    return Err(ParseError::new("entity must not be empty"));
                }
                query.entity = Some(value.to_string());
            }
            Key::Limit => query.limit = Some(parse_limit(value)?),
            Key::Order => query.order = Some(parse_order(value)?),
            Key::Include => query.include = Some(parse_include(value)?),
            Key::Where => query.where_clause = Some(parse_where_value(value)?),
        }
    }

    tracing::trace!(clauses = scan.clauses.len(), "parsed query");
    Ok(query)
}

/// Parse and then validate entity, relation, and field references.
pub fn parse_with_schema(input: &str, schema: &Schema) -> Result<Query, ParseError> {
    let query = parse(input)?;
    validate(&query, schema)?;
    Ok(query)
}

/// Non-throwing probe: true when the query parses (and validates, when a
/// schema is supplied).
pub fn is_valid(input: &str, schema: Option<&Schema>) -> bool {
    match schema {
        Some(schema) => parse_with_schema(input, schema).is_ok(),
        None => parse(input).is_ok(),
    }
}

fn parse_limit(value: &str) -> Result<u64, ParseError> {
    let numeric = Regex::new(r"^-?\d+(\.\d+)?$").unwrap();
    if !numeric.is_match(value) {
        return Err(ParseError::new("limit must be a valid integer"));
    }
    if value.starts_with('-') {
        return Err(ParseError::new("limit must be non-negative"));
    }
    if value.contains('.') {
        return Err(ParseError::new("limit must be an integer without decimals"));
    }
    value
        .parse::<u64>()
        .map_err(|_| ParseError::new("limit must be a valid integer"))
}

fn parse_order(value: &str) -> Result<Vec<OrderTerm>, ParseError> {
    let mut terms = Vec::new();
    for part in value.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let mut words = part.split_ascii_whitespace();
        let field = match words.next() {
            Some(word) => word,
            None => continue,
        };
        if OrderDir::from_str(field).is_some() {
            return Err(ParseError::new(format!(
                "Invalid order term \"{part}\": order must be a field name"
            )));
        }
        let dir = match words.next() {
            None => OrderDir::Asc,
            Some(word) => OrderDir::from_str(word).ok_or_else(|| {
                ParseError::new(format!(
                    "Invalid order direction \"{word}\": expected asc or desc"
                ))
            })?,
        };
        if words.next().is_some() {
            return Err(ParseError::new(format!(
                "Invalid order term \"{part}\": expected field and optional direction"
            )));
        }
        terms.push(OrderTerm {
            field: field.to_string(),
            dir,
        });
    }
    Ok(terms)
}

fn parse_include(value: &str) -> Result<OrderedMap<bool>, ParseError> {
    let mut include = OrderedMap::new();
    for part in value.split(',') {
        let part = part.trim();
        if part.is_empty() {
            return Err(ParseError::new("Empty include entry"));
        }
        include.insert(part, true);
    }
    Ok(include)
}

fn parse_where_value(value: &str) -> Result<Condition, ParseError> {
    let inner = strip_outer_parens(value);
    if inner.trim().is_empty() {
        return Err(ParseError::new("Empty where clause"));
    }
    parse_where_expr(inner)
}

/// Strip one pair of outermost parentheses when the leading `(` is matched
/// by the final character.
fn strip_outer_parens(value: &str) -> &str {
    let bytes = value.as_bytes();
    if bytes.first() != Some(&b'(') || bytes.last() != Some(&b')') {
        return value;
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
                if depth == 0 {
                    return if i == bytes.len() - 1 {
                        &value[1..i]
                    } else {
                        value
                    };
                }
                i += 1;
            }
            b'"' => i = skip_quoted(bytes, i).unwrap_or(bytes.len()),
            _ => i += 1,
        }
    }
    value
}

fn parse_where_expr(input: &str) -> Result<Condition, ParseError> {
    let tokens = tokenize_where(input)?;
    if tokens.is_empty() {
        return Err(ParseError::new("Empty or invalid where expression"));
    }
    let mut parser = WhereParser { tokens, pos: 0 };
    let condition = parser.parse_or()?;
    match parser.peek().map(|t| t.kind) {
        None => Ok(condition),
        Some(TokenKind::RParen) => Err(ParseError::new("Unbalanced parentheses in where clause")),
        Some(_) => Err(ParseError::new("Incomplete comparison in where clause")),
    }
}

/// Recursive-descent parser over the where-expression token stream.
struct WhereParser {
    tokens: Vec<Token>,
    pos: usize,
}

impl WhereParser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.peek().map(|t| t.kind) == Some(kind) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn starts_primary(&self) -> bool {
        matches!(
            self.peek().map(|t| t.kind),
            Some(
                TokenKind::LParen
                    | TokenKind::Str
                    | TokenKind::Number
                    | TokenKind::Bool
                    | TokenKind::Ident
            )
        )
    }

    fn parse_or(&mut self) -> Result<Condition, ParseError> {
        let mut children = vec![self.parse_and()?];
        while self.eat(TokenKind::Or) {
            if !self.starts_primary() {
                return Err(ParseError::new("Invalid where: OR with no right side"));
            }
            children.push(self.parse_and()?);
        }
        Ok(flatten_or(children))
    }

    fn parse_and(&mut self) -> Result<Condition, ParseError> {
        let mut children = vec![self.parse_primary()?];
        loop {
            if self.eat(TokenKind::And) {
                if !self.starts_primary() {
                    return Err(ParseError::new("Invalid where: AND with no right side"));
                }
                children.push(self.parse_primary()?);
            } else if self.starts_primary() {
                children.push(self.parse_primary()?);
            } else {
                break;
            }
        }
        Ok(flatten_and(children))
    }

    fn parse_primary(&mut self) -> Result<Condition, ParseError> {
        match self.peek().map(|t| t.kind) {
            Some(TokenKind::LParen) => {
                self.pos += 1;
                if self.peek().map(|t| t.kind) == Some(TokenKind::RParen) {
                    return Err(ParseError::new("Empty parenthetical expression"));
                }
                let inner = self.parse_or()?;
                if !self.eat(TokenKind::RParen) {
                    return Err(ParseError::new("Missing closing parenthesis"));
                }
                Ok(inner)
            }
            Some(TokenKind::Or) => Err(ParseError::new("Invalid where: OR with no left side")),
            Some(TokenKind::And) => Err(ParseError::new("Invalid where: AND with no left side")),
            Some(TokenKind::RParen) => {
                Err(ParseError::new("Unbalanced parentheses in where clause"))
            }
            Some(_) => self.parse_comparison(),
            None => Err(ParseError::new("Empty or invalid where expression")),
        }
    }

    fn parse_comparison(&mut self) -> Result<Condition, ParseError> {
        let field = match self.peek() {
            Some(token) if matches!(token.kind, TokenKind::Ident | TokenKind::Str) => {
                token.text.clone()
            }
            _ => return Err(ParseError::new("Incomplete comparison in where clause")),
        };
        self.pos += 1;

        let op = match self.peek().map(|t| t.kind) {
            Some(TokenKind::Op(op)) => {
                self.pos += 1;
                op
            }
            _ => CompareOp::Eq,
        };

        let value = match self.advance() {
            None => return Err(ParseError::new("Incomplete comparison in where clause")),
            Some(token) => match token.kind {
                TokenKind::Str | TokenKind::Ident => Value::String(token.text),
                TokenKind::Number => number_value(&token.text),
                TokenKind::Bool => Value::Bool(token.text.eq_ignore_ascii_case("true")),
                _ => return Err(ParseError::new("Invalid value in where comparison")),
            },
        };

        Ok(Condition::Comparison { field, op, value })
    }
}

/// Integer literals stay integers; the fractional form parses as float.
fn number_value(text: &str) -> Value {
    if !text.contains('.') {
        if let Ok(n) = text.parse::<i64>() {
            return Value::Int(n);
        }
    }
    Value::Float(text.parse::<f64>().unwrap_or(0.0))
}

fn flatten_and(mut children: Vec<Condition>) -> Condition {
    if children.len() == 1 {
        return children.remove(0);
    }
    let mut flat = Vec::with_capacity(children.len());
    for child in children {
        match child {
            Condition::And { and } => flat.extend(and),
            other => flat.push(other),
        }
    }
    Condition::And { and: flat }
}

fn flatten_or(mut children: Vec<Condition>) -> Condition {
    if children.len() == 1 {
        return children.remove(0);
    }
    let mut flat = Vec::with_capacity(children.len());
    for child in children {
        match child {
            Condition::Or { or } => flat.extend(or),
            other => flat.push(other),
        }
    }
    Condition::Or { or: flat }
}

/// Check entity, relation, and where-field references against the schema.
///
/// Unknown where fields are collected across the whole tree and reported in
/// one message. Order fields are deliberately not checked.
fn validate(query: &Query, schema: &Schema) -> Result<(), ParseError> {
    let entity_name = match &query.entity {
        Some(name) => name,
        None => return Ok(()),
    };
    let entity = schema.entity(entity_name).ok_or_else(|| {
        let known = schema
            .entities
            .iter()
            .map(|e| e.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        ParseError::new(format!(
            "Unknown entity \"{entity_name}\". Known entities: {known}"
        ))
    })?;

    if let Some(include) = &query.include {
        for relation in include.keys() {
            if !entity.has_relation(relation) {
                let known = entity.relations.join(", ");
                return Err(ParseError::new(format!(
                    "Unknown relation \"{relation}\" for entity \"{entity_name}\". Known relations: {known}"
                )));
            }
        }
    }

    if let Some(condition) = &query.where_clause {
        let mut unknown: Vec<&str> = Vec::new();
        collect_unknown_fields(condition, entity, &mut unknown);
        if !unknown.is_empty() {
            let known = entity.fields.keys().collect::<Vec<_>>().join(", ");
            return Err(ParseError::new(format!(
                "Unknown field(s) for entity \"{entity_name}\": {}. Known fields: {known}",
                unknown.join(", ")
            )));
        }
    }

    Ok(())
}

fn collect_unknown_fields<'a>(condition: &'a Condition, entity: &EntityDef, out: &mut Vec<&'a str>) {
    match condition {
        Condition::Comparison { field, .. } => {
            if entity.field(field).is_none() && !out.contains(&field.as_str()) {
                out.push(field);
            }
        }
        Condition::And { and } => {
            for child in and {
                collect_unknown_fields(child, entity, out);
            }
        }
        Condition::Or { or } => {
            for child in or {
                collect_unknown_fields(child, entity, out);
            }
        }
    }
}
