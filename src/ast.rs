// Copyright 2025 StrongDM Inc
// SPDX-License-Identifier: Apache-2.0

//! RQL query tree types.
//!
//! These types mirror the canonical JSON query shape shared with the
//! frontend filter bar and backend executors.

use serde::{Deserialize, Serialize};

use crate::schema::OrderedMap;

/// A parsed RQL query.
///
/// Every field is optional; each recognized top-level clause fills in at
/// most one of them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Query {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<Vec<OrderTerm>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include: Option<OrderedMap<bool>>,
    #[serde(rename = "where", default, skip_serializing_if = "Option::is_none")]
    pub where_clause: Option<Condition>,
}

/// One term of an `order:` clause.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTerm {
    pub field: String,
    pub dir: OrderDir,
}

/// Sort direction; `asc` when omitted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderDir {
    #[default]
    Asc,
    Desc,
}

impl OrderDir {
    /// Case-insensitive lookup of a direction word.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Some(Self::Asc),
            "desc" => Some(Self::Desc),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

/// Condition node in a `where:` expression.
///
/// Logical nodes are flattened: an `And` never directly contains an `And`,
/// an `Or` never directly contains an `Or`, and both carry at least two
/// children.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Condition {
    Comparison {
        field: String,
        op: CompareOp,
        value: Value,
    },
    And {
        and: Vec<Condition>,
    },
    Or {
        or: Vec<Condition>,
    },
}

/// Comparison operators supported in `where:` expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = "!=")]
    Neq,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<=")]
    Lte,
    #[serde(rename = ">=")]
    Gte,
}

impl CompareOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Neq => "!=",
            Self::Lt => "<",
            Self::Gt => ">",
            Self::Lte => "<=",
            Self::Gte => ">=",
        }
    }

    pub fn all() -> &'static [Self] {
        &[Self::Eq, Self::Neq, Self::Lt, Self::Gt, Self::Lte, Self::Gte]
    }
}

/// Literal value of a comparison.
///
/// Quoted values are always strings, even when they look numeric; unquoted
/// values are typed by shape. Integer literals round-trip as integers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Float(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

/// The five recognized top-level clause keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Key {
    Entity,
    Limit,
    Order,
    Include,
    Where,
}

impl Key {
    /// Case-insensitive lookup of a clause key.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "entity" => Some(Self::Entity),
            "limit" => Some(Self::Limit),
            "order" => Some(Self::Order),
            "include" => Some(Self::Include),
            "where" => Some(Self::Where),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Entity => "entity",
            Self::Limit => "limit",
            Self::Order => "order",
            Self::Include => "include",
            Self::Where => "where",
        }
    }

    /// The label autocomplete offers for this key at the top level.
    pub fn clause_label(&self) -> &'static str {
        match self {
            Self::Entity => "entity:",
            Self::Limit => "limit:",
            Self::Order => "order:",
            Self::Include => "include:",
            Self::Where => "where:(",
        }
    }

    pub fn all() -> &'static [Self] {
        &[
            Self::Entity,
            Self::Limit,
            Self::Order,
            Self::Include,
            Self::Where,
        ]
    }
}
