// Copyright 2025 StrongDM Inc
// SPDX-License-Identifier: Apache-2.0

//! RQL: a compact single-line query language for search and filter bars.
//!
//! A query is a sequence of `key:value` clauses mapping onto a canonical
//! JSON-shaped query tree.
//!
//! # Syntax
//!
//! ```text
//! entity:users
//! entity:users limit:10 where:(status=active OR role=admin)
//! entity:products order:price desc,name include:reviews,vendor
//! entity:users where:((role=admin) OR (age>=18 AND verified=true))
//! ```
//!
//! # Top-level keys
//!
//! | Key | Value | Example |
//! |-----|-------|---------|
//! | `entity` | entity name | `entity:users` |
//! | `limit` | non-negative integer | `limit:25` |
//! | `order` | `field [asc\|desc]` list | `order:price desc,name` |
//! | `include` | relation list | `include:posts,profile` |
//! | `where` | condition expression | `where:(age>=18 AND status=active)` |
//!
//! Keys are matched case-insensitively and each may appear at most once.
//!
//! # Where operators
//!
//! | Operator | Meaning | Example |
//! |----------|---------|---------|
//! | `=` | Equal (default when omitted) | `status=active` |
//! | `!=` | Not equal | `status!=banned` |
//! | `<`, `<=`, `>`, `>=` | Range | `age>=18` |
//! | `AND` | Conjunction (also implicit by adjacency) | `a=1 AND b=2` |
//! | `OR` | Disjunction, binds looser than AND | `a=1 OR b=2` |
//!
//! Quoted values are always strings; unquoted values are typed by shape
//! (number, boolean, otherwise string).
//!
//! # Autocomplete
//!
//! [`context`] classifies a cursor position inside possibly incomplete
//! input, and [`suggest`] turns that context plus a [`Schema`] into ranked,
//! prefix-filtered [`Suggestion`]s. The pipeline never fails, whatever the
//! input.

pub mod ast;
pub mod complete;
pub mod error;
mod lexer;
pub mod parser;
pub mod schema;

pub use ast::{CompareOp, Condition, Key, OrderDir, OrderTerm, Query, Value};
pub use complete::{context, suggest, suggest_at, CursorContext, Suggestion};
pub use error::ParseError;
pub use parser::{is_valid, parse, parse_with_schema};
pub use schema::{EntityDef, FieldDef, FieldType, OrderedMap, Schema};
