//! Checking concrete documents against a schema.
//!
//! The document itself is the resolution context: range bounds and derived
//! fields are recomputed from the document's own values, so a document
//! passes only if its derived fields agree with what they derive from.
use serde_json::Value;

use crate::deferred::Resolution;
use crate::error::{Error, Result};
use crate::fmap::Fmap;
use crate::node::{Node, Record};
use crate::num::Num;
use crate::path::Path;
use crate::record::resolve_leaf;

/// Accept `value` or report the first violation as `Error::Invalid`.
pub fn validate(schema: &Node, value: &Value) -> Result<()> {
    let ctx = match Node::from(value.clone()) {
        Node::Record(record) => record,
        _ => Record::new(),
    };
    check(schema, value, &Path::root(), &ctx)
}

fn check(schema: &Node, value: &Value, at: &Path, ctx: &Record) -> Result<()> {
    match schema {
        Node::Lit(expected) if same(expected, value) => Ok(()),
        Node::Lit(expected) => Err(Error::invalid(at, value, format!("expected {expected}"))),
        Node::Prim(prim) if prim.admits(value) => Ok(()),
        Node::Prim(prim) => Err(Error::invalid(at, value, format!("expected {}", prim.name()))),
        Node::Range(range) => {
            let range = range.clone().try_fmap(&mut |leaf| resolve_leaf(leaf, ctx))?;
            range.check(value, at)
        }
        Node::Deferred(expr) => match expr.resolve(ctx)? {
            Resolution::Resolved(derived) => check(&derived, value, at, ctx)
                .map_err(|_| Error::invalid(at, value, format!("does not match derived `{expr}`"))),
            Resolution::Deferred => Err(Error::invalid(at, value, format!("`{expr}` could not be computed"))),
        },
        Node::Record(record) => check_record(record, value, at, ctx),
        Node::List(items) => check_list(items, value, at, ctx),
        Node::Frozen(frozen) => check_list(frozen.source(), value, at, ctx),
    }
}

fn check_record(record: &Record, value: &Value, at: &Path, ctx: &Record) -> Result<()> {
    let Value::Object(object) = value else {
        return Err(Error::invalid(at, value, "expected an object"));
    };
    for (name, node) in record.iter() {
        match object.get(name) {
            Some(field) => check(node, field, &at.child(name), ctx)?,
            None if record.is_optional(name) => {}
            None => return Err(Error::invalid(&at.child(name), &Value::Null, "missing required field")),
        }
    }
    if let Some((key, field)) = object.iter().find(|(key, _)| record.get(key).is_none()) {
        return Err(Error::invalid(&at.child(key), field, "unexpected field"));
    }
    Ok(())
}

fn check_list(items: &[Node], value: &Value, at: &Path, ctx: &Record) -> Result<()> {
    let Value::Array(elements) = value else {
        return Err(Error::invalid(at, value, "expected an array"));
    };
    for (i, element) in elements.iter().enumerate() {
        let at = at.child(i);
        if let [only] = items {
            check(only, element, &at, ctx)?;
            continue;
        }
        let mut matched = false;
        for item in items {
            match check(item, element, &at, ctx) {
                Ok(()) => {
                    matched = true;
                    break;
                }
                Err(Error::Invalid { .. }) => {}
                Err(other) => return Err(other),
            }
        }
        if !matched {
            return Err(Error::invalid(&at, element, "matches none of the element schemas"));
        }
    }
    Ok(())
}

/// Numbers compare by value, so `4` matches `4.0`.
fn same(expected: &Value, value: &Value) -> bool {
    match (Num::from_value(expected), Num::from_value(value)) {
        (Some(a), Some(b)) => a.total_cmp(b).is_eq(),
        _ => expected == value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deferred::{Aggregate, Deferred, Predicate};
    use crate::node::Prim;
    use crate::validators::Range;
    use serde_json::json;

    fn invalid_at(result: Result<()>) -> String {
        match result {
            Err(Error::Invalid { path, .. }) => path.to_string(),
            other => panic!("expected a violation, got {other:?}"),
        }
    }

    fn ledger() -> Node {
        Record::new()
            .field("items", vec![Node::from(Record::new().field("amount", Range::new(1, 10)).field("ok", Prim::Bool))])
            .field("total", Deferred::aggregate(Aggregate::Sum, "items.amount", Predicate::field("ok").unwrap()).unwrap())
            .optional("memo", Prim::Text)
            .into()
    }

    #[test]
    fn accepts_a_consistent_document() {
        let doc = json!({"items": [{"amount": 3, "ok": true}, {"amount": 9, "ok": false}], "total": 3});
        validate(&ledger(), &doc).unwrap();
        let doc = json!({"items": [], "total": 0, "memo": "empty"});
        validate(&ledger(), &doc).unwrap();
    }

    #[test]
    fn derived_fields_must_agree_with_their_inputs() {
        let doc = json!({"items": [{"amount": 3, "ok": true}], "total": 4});
        assert_eq!(invalid_at(validate(&ledger(), &doc)), "total");
    }

    #[test]
    fn reports_the_offending_location() {
        let doc = json!({"items": [{"amount": 3, "ok": true}, {"amount": 11, "ok": true}], "total": 14});
        assert_eq!(invalid_at(validate(&ledger(), &doc)), "items.1.amount");
        let doc = json!({"items": [{"amount": 3, "ok": "yes"}], "total": 3});
        assert_eq!(invalid_at(validate(&ledger(), &doc)), "items.0.ok");
    }

    #[test]
    fn records_are_closed() {
        assert_eq!(invalid_at(validate(&ledger(), &json!({"items": []}))), "total");
        assert_eq!(invalid_at(validate(&ledger(), &json!({"items": [], "total": 0, "extra": 1}))), "extra");
        assert_eq!(invalid_at(validate(&ledger(), &json!([1]))), "<root>");
    }

    #[test]
    fn bounds_resolve_against_the_document() {
        let schema = Node::from(
            Record::new()
                .field("init_state", Record::new().field("balance", Prim::Int))
                .field("event", Record::new().field("amount", Range::at_most(Deferred::reference("init_state.balance").unwrap()))),
        );
        validate(&schema, &json!({"init_state": {"balance": 5}, "event": {"amount": 5}})).unwrap();
        let err = validate(&schema, &json!({"init_state": {"balance": 5}, "event": {"amount": 6}}));
        assert_eq!(invalid_at(err), "event.amount");
    }

    #[test]
    fn literals_compare_numbers_by_value() {
        validate(&Node::from(4), &json!(4.0)).unwrap();
        assert!(validate(&Node::from("4"), &json!(4)).is_err());
    }
}
