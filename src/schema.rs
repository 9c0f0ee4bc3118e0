//! JSON schema files.
//!
//! Plain JSON is read structurally (objects are records, arrays are lists,
//! scalars are literals) and single-key objects whose key starts with `$`
//! are directives:
//!
//! ```json
//! {
//!   "state": {
//!     "charges": {"$frozen": [{"amount": {"$range": {"min": 10, "max": 20}}, "ok": {"$type": "bool"}}]},
//!     "balance": {"$agg": {"fn": "sum", "path": "charges.amount", "where": {"field": "ok"}}},
//!     "note?": {"$type": "text"}
//!   },
//!   "event": {"amount": {"$range": {"max": {"$ref": "init_state.balance"}}}}
//! }
//! ```
//!
//! A trailing `?` on a key marks the field optional.
use serde::Deserialize;
use serde_json::{Map, Value, json};

use crate::config::Config;
use crate::contract::InputContract;
use crate::deferred::{Aggregate, Deferred, ListAggregate, Predicate};
use crate::draw::Drawer;
use crate::error::{Error, Result};
use crate::frozen::FrozenDraw;
use crate::node::{Node, Prim, Record};
use crate::path::Path;
use crate::path_de::from_value_with_path;
use crate::validators::Range;

// ------------------------------ Payloads --------------------------------- //

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ContractFile {
    state: Value,
    #[serde(default)]
    event: Option<Value>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RangeArgs {
    #[serde(default)]
    min: Option<Value>,
    #[serde(default)]
    max: Option<Value>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct AggArgs {
    #[serde(rename = "fn")]
    agg: Aggregate,
    path: String,
    #[serde(default, rename = "where")]
    predicate: Option<PredicateArgs>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PredicateArgs {
    Not { not: Box<PredicateArgs> },
    Field {
        field: String,
        #[serde(default)]
        eq: Option<Value>,
    },
}

impl PredicateArgs {
    fn into_predicate(self) -> Result<Predicate> {
        match self {
            PredicateArgs::Not { not } => Ok(not.into_predicate()?.negate()),
            PredicateArgs::Field { field, eq: None } => Predicate::field(&field),
            PredicateArgs::Field { field, eq: Some(v) } => Predicate::equals(&field, v),
        }
    }
}

// ------------------------------- Loading --------------------------------- //

/// Turns DSL documents into nodes. `$frozen` lists are drawn while loading,
/// with the loader's drawer.
pub struct Loader<'a> {
    drawer: &'a mut Drawer,
    config: &'a Config,
}

impl<'a> Loader<'a> {
    pub fn new(drawer: &'a mut Drawer, config: &'a Config) -> Self {
        Loader { drawer, config }
    }

    pub fn contract(&mut self, document: Value) -> Result<InputContract> {
        let file: ContractFile = from_value_with_path(document).map_err(|msg| Error::schema(&Path::root(), msg))?;
        let state = self.node(&file.state, &Path::root().child("state"))?;
        match file.event {
            None => Ok(InputContract::creator(state)),
            Some(event) => Ok(InputContract::transition(state, self.node(&event, &Path::root().child("event"))?)),
        }
    }

    pub fn load(&mut self, document: &Value) -> Result<Node> {
        self.node(document, &Path::root())
    }

    fn node(&mut self, value: &Value, at: &Path) -> Result<Node> {
        match value {
            Value::Array(items) => Ok(Node::List(self.items(items, at)?)),
            Value::Object(map) => match directive(map) {
                Some((name, payload)) => self.directive(name, payload, &at.child(name)),
                None => self.record(map, at),
            },
            scalar => Ok(Node::Lit(scalar.clone())),
        }
    }

    fn items(&mut self, items: &[Value], at: &Path) -> Result<Vec<Node>> {
        items.iter().enumerate().map(|(i, item)| self.node(item, &at.child(i))).collect()
    }

    fn record(&mut self, map: &Map<String, Value>, at: &Path) -> Result<Node> {
        let mut record = Record::new();
        for (key, value) in map {
            if key.starts_with('$') {
                return Err(Error::schema(at, format!("directive `{key}` must be the only key of its object")));
            }
            match key.strip_suffix('?') {
                Some(name) => record = record.optional(name, self.node(value, &at.child(name))?),
                None => record.insert(key.as_str(), self.node(value, &at.child(key))?),
            }
        }
        Ok(record.into())
    }

    fn directive(&mut self, name: &str, payload: &Value, at: &Path) -> Result<Node> {
        let decode = |msg: String| Error::schema(at, msg);
        match name {
            "$type" => {
                let prim: Prim = from_value_with_path(payload.clone()).map_err(decode)?;
                Ok(prim.into())
            }
            "$range" => {
                let args: RangeArgs = from_value_with_path(payload.clone()).map_err(decode)?;
                let min = args.min.map(|v| self.node(&v, &at.child("min"))).transpose()?;
                let max = args.max.map(|v| self.node(&v, &at.child("max"))).transpose()?;
                Ok(Range { min: min.map(Box::new), max: max.map(Box::new) }.into())
            }
            "$ref" => Ok(Deferred::Ref(self.path(payload, at)?).into()),
            "$defref" => Ok(Deferred::DefRef(self.path(payload, at)?).into()),
            "$const" => Ok(Deferred::constant(payload.clone()).into()),
            "$sum" => {
                let terms: Vec<Value> = from_value_with_path(payload.clone()).map_err(decode)?;
                let terms = terms
                    .iter()
                    .enumerate()
                    .map(|(i, term)| self.expr(term, &at.child(i)))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Deferred::sum(terms).into())
            }
            "$sub" => {
                let [a, b]: [Value; 2] = from_value_with_path(payload.clone()).map_err(decode)?;
                Ok(Deferred::difference(self.expr(&a, &at.child(0))?, self.expr(&b, &at.child(1))?).into())
            }
            "$agg" => {
                let args: AggArgs = from_value_with_path(payload.clone()).map_err(decode)?;
                let predicate = match args.predicate {
                    Some(predicate) => predicate.into_predicate()?,
                    None => Predicate::Always,
                };
                Ok(Deferred::aggregate(args.agg, &args.path, predicate)?.into())
            }
            "$frozen" => {
                let Value::Array(items) = payload else {
                    return Err(Error::schema(at, "expected an array of item schemas"));
                };
                let source = self.items(items, at)?;
                Ok(FrozenDraw::new(source, self.drawer, self.config)?.into())
            }
            other => Err(Error::schema(at, format!("unknown directive `{other}`"))),
        }
    }

    fn path(&self, payload: &Value, at: &Path) -> Result<Path> {
        match payload {
            Value::String(src) => Path::parse(src),
            other => Err(Error::schema(at, format!("expected a dotted path string, found {other}"))),
        }
    }

    /// Operands of `$sum`/`$sub`: expressions or numeric literals.
    fn expr(&mut self, value: &Value, at: &Path) -> Result<Deferred> {
        match self.node(value, at)? {
            Node::Deferred(expr) => Ok(expr),
            Node::Lit(v) => Ok(Deferred::Const(v)),
            other => Err(Error::schema(at, format!("expected an expression, found a {}", other.kind()))),
        }
    }
}

fn directive(map: &Map<String, Value>) -> Option<(&str, &Value)> {
    match map.iter().next() {
        Some((key, payload)) if map.len() == 1 && key.starts_with('$') => Some((key.as_str(), payload)),
        _ => None,
    }
}

// ------------------------------ Rendering -------------------------------- //

/// Render a node back into the DSL. Frozen draws render as the list they
/// drew.
pub fn to_json(node: &Node) -> Value {
    match node {
        Node::Lit(v) => v.clone(),
        Node::Prim(prim) => json!({"$type": prim.name()}),
        Node::Record(record) => Value::Object(
            record
                .iter()
                .map(|(name, node)| {
                    let key = if record.is_optional(name) { format!("{name}?") } else { name.clone() };
                    (key, to_json(node))
                })
                .collect(),
        ),
        Node::List(items) => Value::Array(items.iter().map(to_json).collect()),
        Node::Frozen(frozen) => Value::Array(frozen.draw().iter().map(to_json).collect()),
        Node::Range(range) => {
            let mut args = Map::new();
            if let Some(min) = &range.min {
                args.insert("min".to_string(), to_json(min));
            }
            if let Some(max) = &range.max {
                args.insert("max".to_string(), to_json(max));
            }
            json!({"$range": args})
        }
        Node::Deferred(expr) => expr_json(expr),
    }
}

fn expr_json(expr: &Deferred) -> Value {
    match expr {
        Deferred::Const(v) => json!({"$const": v}),
        Deferred::Ref(path) => json!({"$ref": path.to_string()}),
        Deferred::DefRef(path) => json!({"$defref": path.to_string()}),
        Deferred::Sum(terms) => json!({"$sum": terms.iter().map(expr_json).collect::<Vec<_>>()}),
        Deferred::Difference(a, b) => json!({"$sub": [expr_json(a), expr_json(b)]}),
        Deferred::ListAggregate(ListAggregate { agg, list, item, predicate }) => {
            let path = match item {
                Some(item) => format!("{list}.{item}"),
                None => list.to_string(),
            };
            let mut args = json!({"fn": agg.name(), "path": path});
            if let Some(predicate) = predicate_json(predicate) {
                args["where"] = predicate;
            }
            json!({"$agg": args})
        }
    }
}

fn predicate_json(predicate: &Predicate) -> Option<Value> {
    match predicate {
        Predicate::Always => None,
        Predicate::Field(path) => Some(json!({"field": path.to_string()})),
        Predicate::Equals(path, v) => Some(json!({"field": path.to_string(), "eq": v})),
        Predicate::Not(inner) => Some(json!({"not": predicate_json(inner)?})),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(document: Value) -> Result<Node> {
        Loader::new(&mut Drawer::seeded(0), &Config::default()).load(&document)
    }

    #[test]
    fn loads_directives_and_optional_keys() {
        let node = load(json!({
            "limit": {"$range": {"min": 1, "max": {"$ref": "cap"}}},
            "cap": 10,
            "kind": {"$type": "text"},
            "note?": {"$type": "text"},
            "left": {"$sub": [{"$ref": "cap"}, 3]},
        }))
        .unwrap();
        let Node::Record(record) = &node else { panic!("expected a record") };
        assert!(record.is_optional("note"));
        assert!(!record.is_optional("kind"));
        assert_eq!(record.get("kind"), Some(&Node::Prim(Prim::Text)));
        assert_eq!(
            record.get("limit"),
            Some(&Node::from(Range::new(1, Deferred::reference("cap").unwrap())))
        );
        assert_eq!(
            record.get("left"),
            Some(&Node::from(Deferred::difference(Deferred::reference("cap").unwrap(), 3i64)))
        );
    }

    #[test]
    fn aggregates_decode_predicates() {
        let node = load(json!({"$agg": {"fn": "count", "path": "xs", "where": {"not": {"field": "k", "eq": "a"}}}})).unwrap();
        let expected = Deferred::aggregate(Aggregate::Count, "xs", Predicate::equals("k", "a").unwrap().negate()).unwrap();
        assert_eq!(node, Node::from(expected));
    }

    #[test]
    fn renders_back_to_the_same_document() {
        let document = json!({
            "a": {"$range": {"min": {"$defref": "b"}}},
            "b": [{"$type": "int"}, "x"],
            "c?": {"$agg": {"fn": "sum", "path": "b.v", "where": {"field": "ok"}}},
            "d": {"$sum": [{"$const": 1}, {"$ref": "a"}]},
        });
        assert_eq!(to_json(&load(document.clone()).unwrap()), document);
    }

    #[test]
    fn frozen_lists_are_drawn_at_load_time() {
        let node = load(json!({"$frozen": [{"$range": {"min": 1, "max": 3}}]})).unwrap();
        let Node::Frozen(frozen) = &node else { panic!("expected a frozen draw") };
        assert!(frozen.draw().iter().all(|n| n.to_value().unwrap().as_i64().is_some_and(|v| (1..=3).contains(&v))));
    }

    #[test]
    fn errors_name_the_location() {
        let err = load(json!({"a": {"b": {"$type": "decimal"}}})).unwrap_err();
        assert!(matches!(&err, Error::Schema { at, .. } if at == "a.b.$type"), "{err}");
        let err = load(json!({"a": {"$nope": 1}})).unwrap_err();
        assert!(matches!(&err, Error::Schema { at, .. } if at == "a.$nope"), "{err}");
        assert!(matches!(load(json!({"$ref": "a..b"})), Err(Error::BadPath(_))));
        assert!(load(json!({"$sub": [1]})).is_err());
    }

    #[test]
    fn contract_files_split_state_and_event() {
        let mut drawer = Drawer::seeded(0);
        let config = Config::default();
        let mut loader = Loader::new(&mut drawer, &config);
        let contract = loader.contract(json!({"state": {"n": 1}})).unwrap();
        assert!(contract.is_creator());
        let contract = loader.contract(json!({"state": {"n": 1}, "event": {"m": {"$ref": "init_state.n"}}})).unwrap();
        assert!(!contract.is_creator());
        assert!(loader.contract(json!({"state": {}, "extra": 1})).is_err());
    }
}
