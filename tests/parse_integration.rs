// Copyright 2025 StrongDM Inc
// SPDX-License-Identifier: Apache-2.0

//! RQL Parser Integration Tests
//!
//! End-to-end tests covering clause parsing, the where grammar, the
//! canonical JSON query shape, and schema validation.

use rql::{
    is_valid, parse, parse_with_schema, Condition, OrderDir, OrderTerm, Query, Schema, Value,
};
use serde_json::json;

fn demo_schema() -> Schema {
    serde_json::from_str(
        r#"{
            "entities": [
                {
                    "name": "users",
                    "relations": ["posts", "profile"],
                    "fields": {
                        "status": {"type": "string", "values": ["active", "inactive", "banned"]},
                        "role": {"type": "string", "values": ["admin", "member"]},
                        "age": {"type": "number"},
                        "verified": {"type": "boolean"},
                        "name": {"type": "string"}
                    }
                },
                {
                    "name": "products",
                    "relations": ["reviews", "vendor"],
                    "fields": {
                        "price": {"type": "number"},
                        "name": {"type": "string"},
                        "stock": {"type": "number"}
                    }
                }
            ]
        }"#,
    )
    .expect("demo schema should deserialize")
}

// ============================================================================
// Parser Tests
// ============================================================================

#[test]
fn test_parse_entity_only() {
    let query = parse("entity:users").expect("should parse");
    assert_eq!(
        serde_json::to_value(&query).unwrap(),
        json!({"entity": "users"})
    );
}

#[test]
fn test_parse_implicit_and_with_typed_values() {
    let query = parse("entity:users limit:10 where:(status=active age>=18)").expect("should parse");
    assert_eq!(
        serde_json::to_value(&query).unwrap(),
        json!({
            "entity": "users",
            "limit": 10,
            "where": {"and": [
                {"field": "status", "op": "=", "value": "active"},
                {"field": "age", "op": ">=", "value": 18}
            ]}
        })
    );
}

#[test]
fn test_parse_nested_groups() {
    let query = parse("entity:users where:((role=admin) OR (age>=18 AND verified=true))")
        .expect("should parse");
    assert_eq!(
        serde_json::to_value(&query).unwrap(),
        json!({
            "entity": "users",
            "where": {"or": [
                {"field": "role", "op": "=", "value": "admin"},
                {"and": [
                    {"field": "age", "op": ">=", "value": 18},
                    {"field": "verified", "op": "=", "value": true}
                ]}
            ]}
        })
    );
}

#[test]
fn test_parse_quoted_numeric_stays_string() {
    let query = parse(r#"entity:items where:(id="18")"#).expect("should parse");
    match query.where_clause.expect("where should be set") {
        Condition::Comparison { value, .. } => {
            assert_eq!(value, Value::String("18".to_string()));
        }
        other => panic!("expected Comparison, got {other:?}"),
    }
}

#[test]
fn test_parse_order_terms_default_direction() {
    let query = parse("entity:products order:price asc,name").expect("should parse");
    assert_eq!(query.entity.as_deref(), Some("products"));
    assert_eq!(
        query.order.expect("order should be set"),
        vec![
            OrderTerm {
                field: "price".to_string(),
                dir: OrderDir::Asc,
            },
            OrderTerm {
                field: "name".to_string(),
                dir: OrderDir::Asc,
            },
        ]
    );
}

#[test]
fn test_and_binds_tighter_than_or() {
    let query = parse("where:(a=1 OR b=2 AND c=3)").expect("should parse");
    assert_eq!(
        serde_json::to_value(&query).unwrap(),
        json!({
            "where": {"or": [
                {"field": "a", "op": "=", "value": 1},
                {"and": [
                    {"field": "b", "op": "=", "value": 2},
                    {"field": "c", "op": "=", "value": 3}
                ]}
            ]}
        })
    );
}

#[test]
fn test_include_serializes_as_object() {
    let query = parse("entity:users include:posts,profile").expect("should parse");
    assert_eq!(
        serde_json::to_value(&query).unwrap(),
        json!({
            "entity": "users",
            "include": {"posts": true, "profile": true}
        })
    );
}

#[test]
fn test_duplicate_keys_rejected_for_every_key() {
    let cases = [
        ("entity:a entity:b", "entity"),
        ("limit:1 limit:2", "limit"),
        ("order:a order:b", "order"),
        ("include:a include:b", "include"),
        ("where:(a=1) where:(b=2)", "where"),
    ];
    for (input, key) in cases {
        let err = parse(input).expect_err("duplicate should be rejected");
        assert_eq!(err.message, format!("Duplicate top-level key: {key}"));
    }
}

#[test]
fn test_negative_limit_rejected() {
    let err = parse("entity:users limit:-1").expect_err("should fail");
    assert_eq!(err.message, "limit must be non-negative");
}

#[test]
fn test_query_tree_json_round_trip() {
    let inputs = [
        "entity:users",
        "entity:users limit:10 where:(status=active age>=18)",
        "entity:users where:((role=admin) OR (age>=18 AND verified=true))",
        "entity:products order:price desc,name include:reviews,vendor",
        r#"entity:items where:(name="a b" score=1.5 ok=false)"#,
    ];
    for input in inputs {
        let query = parse(input).expect("should parse");
        let value = serde_json::to_value(&query).expect("should serialize");
        let back: Query = serde_json::from_value(value).expect("should deserialize");
        assert_eq!(back, query, "round trip differs for {input}");
    }
}

// ============================================================================
// Validation Tests
// ============================================================================

#[test]
fn test_validate_accepts_known_names() {
    let schema = demo_schema();
    let query = parse_with_schema(
        "entity:users include:posts,profile where:(status=active AND age>=18)",
        &schema,
    )
    .expect("should validate");
    assert_eq!(query.entity.as_deref(), Some("users"));
}

#[test]
fn test_validate_unknown_entity() {
    let schema = demo_schema();
    let err = parse_with_schema("entity:accounts", &schema).expect_err("should fail");
    assert_eq!(
        err.message,
        "Unknown entity \"accounts\". Known entities: users, products"
    );
}

#[test]
fn test_validate_entity_is_case_sensitive() {
    let schema = demo_schema();
    assert!(parse_with_schema("entity:Users", &schema).is_err());
}

#[test]
fn test_validate_unknown_relation() {
    let schema = demo_schema();
    let err =
        parse_with_schema("entity:users include:posts,followers", &schema).expect_err("should fail");
    assert_eq!(
        err.message,
        "Unknown relation \"followers\" for entity \"users\". Known relations: posts, profile"
    );
}

#[test]
fn test_validate_aggregates_unknown_fields() {
    let schema = demo_schema();
    let err = parse_with_schema(
        "entity:users where:(nickname=x OR (age>1 AND height<2) OR nickname=y)",
        &schema,
    )
    .expect_err("should fail");
    assert_eq!(
        err.message,
        "Unknown field(s) for entity \"users\": nickname, height. \
         Known fields: status, role, age, verified, name"
    );
}

#[test]
fn test_validate_does_not_check_order_fields() {
    // Documented divergence: order fields are not validated.
    let schema = demo_schema();
    assert!(parse_with_schema("entity:users order:bogus", &schema).is_ok());
}

#[test]
fn test_validate_skipped_without_entity() {
    let schema = demo_schema();
    assert!(parse_with_schema("where:(anything=goes)", &schema).is_ok());
}

// ============================================================================
// is_valid Tests
// ============================================================================

#[test]
fn test_is_valid_matches_parse() {
    let schema = demo_schema();
    let cases = [
        "entity:users",
        "entity:users limit:10",
        "entity:users limit:-1",
        "entity:nope",
        "where:(",
        "bogus",
    ];
    for input in cases {
        assert_eq!(is_valid(input, None), parse(input).is_ok(), "for {input}");
        assert_eq!(
            is_valid(input, Some(&schema)),
            parse_with_schema(input, &schema).is_ok(),
            "for {input} with schema"
        );
    }
}
