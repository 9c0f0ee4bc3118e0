//! Schema nodes.
//!
//! A schema is a tree of [`Node`]s: literals, primitive type markers, records
//! of named fields, sequences, range validators, deferred expressions and
//! frozen draws. Generation turns a schema into a tree that holds only
//! literals, records and sequences, which converts into a plain JSON value.
use std::fmt;

use indexmap::{IndexMap, IndexSet};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::deferred::Deferred;
use crate::error::{Error, Result};
use crate::frozen::FrozenDraw;
use crate::path::Path;
use crate::validators::Range;

#[derive(Clone, Debug, PartialEq)]
pub enum Node {
    /// A concrete scalar (never an array or object; those become `List`/`Record`).
    Lit(Value),
    Prim(Prim),
    Record(Record),
    List(Vec<Node>),
    Range(Range),
    Deferred(Deferred),
    Frozen(FrozenDraw),
}

/// Bare primitive type markers: "any integer", "any boolean", ...
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Prim {
    Int,
    Float,
    Text,
    Bool,
}

impl Prim {
    pub fn name(self) -> &'static str {
        match self {
            Prim::Int => "int",
            Prim::Float => "float",
            Prim::Text => "text",
            Prim::Bool => "bool",
        }
    }

    /// Whether a concrete value inhabits this primitive type.
    pub fn admits(self, v: &Value) -> bool {
        match self {
            Prim::Int => v.is_i64() || v.is_u64(),
            Prim::Float => v.is_number(),
            Prim::Text => v.is_string(),
            Prim::Bool => v.is_boolean(),
        }
    }
}

impl fmt::Display for Prim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.name()) }
}

// ------------------------------- Record ---------------------------------- //

/// Ordered mapping of field name to node. Field order is significant: it is
/// the resolution order and the output order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Record {
    fields: IndexMap<String, Node>,
    optional: IndexSet<String>,
}

impl Record {
    pub fn new() -> Self { Self::default() }

    /// Builder: append a required field.
    pub fn field(mut self, name: impl Into<String>, node: impl Into<Node>) -> Self {
        self.insert(name, node);
        self
    }

    /// Builder: append a field that may be absent from drawn examples.
    pub fn optional(mut self, name: impl Into<String>, node: impl Into<Node>) -> Self {
        let name = name.into();
        self.optional.insert(name.clone());
        self.insert(name, node);
        self
    }

    /// Replacing an existing field keeps its position.
    pub fn insert(&mut self, name: impl Into<String>, node: impl Into<Node>) {
        self.fields.insert(name.into(), node.into());
    }

    pub fn get(&self, name: &str) -> Option<&Node> { self.fields.get(name) }
    pub fn is_optional(&self, name: &str) -> bool { self.optional.contains(name) }
    pub fn names(&self) -> impl Iterator<Item = &String> { self.fields.keys() }
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Node)> { self.fields.iter() }
    pub fn len(&self) -> usize { self.fields.len() }
    pub fn is_empty(&self) -> bool { self.fields.is_empty() }
    pub fn has_optional(&self) -> bool { !self.optional.is_empty() }

    pub(crate) fn fields_mut(&mut self) -> impl Iterator<Item = (&String, &mut Node)> {
        self.fields.iter_mut()
    }
}

impl FromIterator<(String, Node)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, Node)>>(iter: I) -> Self {
        Record { fields: iter.into_iter().collect(), optional: IndexSet::new() }
    }
}

// -------------------------------- Node ----------------------------------- //

impl Node {
    pub fn kind(&self) -> &'static str {
        match self {
            Node::Lit(Value::Null) => "null",
            Node::Lit(Value::Bool(_)) => "bool",
            Node::Lit(Value::Number(_)) => "number",
            Node::Lit(Value::String(_)) => "string",
            Node::Lit(_) => "literal",
            Node::Prim(_) => "type marker",
            Node::Record(_) => "record",
            Node::List(_) => "list",
            Node::Range(_) => "range",
            Node::Deferred(_) => "deferred expression",
            Node::Frozen(_) => "frozen draw",
        }
    }

    pub fn empty_record() -> Node { Node::Record(Record::new()) }

    /// Operands in this state cannot be computed with *yet*. The empty record
    /// is what a missing path reads as.
    pub fn is_pending(&self) -> bool {
        match self {
            Node::Deferred(_) | Node::Range(_) | Node::Prim(_) => true,
            Node::Record(record) => record.is_empty(),
            _ => false,
        }
    }

    /// Pre-order walk over every node, including range bounds, with the
    /// location each one lives at. Range bounds report the range's location.
    pub fn walk<'a>(&'a self, at: &Path, visit: &mut impl FnMut(&Path, &'a Node)) {
        visit(at, self);
        match self {
            Node::Record(record) => {
                for (name, node) in record.iter() {
                    node.walk(&at.child(name), visit);
                }
            }
            Node::List(items) => {
                for (i, node) in items.iter().enumerate() {
                    node.walk(&at.child(i), visit);
                }
            }
            Node::Frozen(frozen) => {
                for (i, node) in frozen.draw().iter().enumerate() {
                    node.walk(&at.child(i), visit);
                }
            }
            Node::Range(range) => {
                for bound in range.bounds_iter() {
                    bound.walk(at, visit);
                }
            }
            Node::Lit(_) | Node::Prim(_) | Node::Deferred(_) => {}
        }
    }

    /// True while generation still has something to do: anything pending,
    /// a list not drawn yet, or a record whose optional fields have not been
    /// decided. Lists come out of a draw frozen and records without optional
    /// fields, so a drawn tree never needs another draw.
    pub fn needs_draw(&self) -> bool {
        let mut needs = false;
        self.walk(&Path::root(), &mut |_, node| match node {
            Node::Deferred(_) | Node::Range(_) | Node::Prim(_) | Node::List(_) => needs = true,
            Node::Record(record) if record.has_optional() => needs = true,
            _ => {}
        });
        needs
    }

    /// A fixed value. Unlike `From<Value>`, arrays become frozen draws of
    /// themselves, so generation never redraws them.
    pub fn fixed(v: Value) -> Node {
        match v {
            Value::Array(xs) => {
                let items: Vec<Node> = xs.into_iter().map(Node::fixed).collect();
                Node::Frozen(FrozenDraw::from_parts(items.clone(), items))
            }
            Value::Object(map) => Node::Record(map.into_iter().map(|(k, v)| (k, Node::fixed(v))).collect()),
            scalar => Node::Lit(scalar),
        }
    }

    /// Locations of deferred expressions (including those inside range bounds).
    pub fn deferred_paths(&self) -> Vec<Path> {
        self.collect_paths(|node| matches!(node, Node::Deferred(_)))
    }

    /// Locations of anything that keeps the tree from being concrete.
    pub fn pending_paths(&self) -> Vec<Path> {
        self.collect_paths(|node| matches!(node, Node::Deferred(_) | Node::Range(_) | Node::Prim(_)))
    }

    fn collect_paths(&self, pick: impl Fn(&Node) -> bool) -> Vec<Path> {
        let mut out = IndexSet::new();
        self.walk(&Path::root(), &mut |at, node| {
            if pick(node) {
                out.insert(at.clone());
            }
        });
        out.into_iter().collect()
    }

    /// Convert a concrete tree into its plain JSON value.
    pub fn to_value(&self) -> Result<Value> {
        let pending = self.pending_paths();
        if !pending.is_empty() {
            return Err(Error::Unresolved { fields: pending });
        }
        Ok(self.to_value_unchecked())
    }

    fn to_value_unchecked(&self) -> Value {
        match self {
            Node::Lit(v) => v.clone(),
            Node::Record(record) => Value::Object(
                record.iter().map(|(k, n)| (k.clone(), n.to_value_unchecked())).collect::<Map<_, _>>(),
            ),
            Node::List(items) => Value::Array(items.iter().map(Node::to_value_unchecked).collect()),
            Node::Frozen(frozen) => Value::Array(frozen.draw().iter().map(Node::to_value_unchecked).collect()),
            // guarded by `to_value`
            Node::Prim(_) | Node::Range(_) | Node::Deferred(_) => Value::Null,
        }
    }
}

// ----------------------------- Conversions ------------------------------- //

impl From<Value> for Node {
    fn from(v: Value) -> Self {
        match v {
            Value::Array(xs) => Node::List(xs.into_iter().map(Node::from).collect()),
            Value::Object(map) => Node::Record(map.into_iter().map(|(k, v)| (k, Node::from(v))).collect()),
            scalar => Node::Lit(scalar),
        }
    }
}

impl From<i64> for Node {
    fn from(i: i64) -> Self { Node::Lit(Value::from(i)) }
}
impl From<i32> for Node {
    fn from(i: i32) -> Self { Node::Lit(Value::from(i)) }
}
impl From<f64> for Node {
    fn from(f: f64) -> Self { Node::Lit(crate::num::Num::Float(f).into_value()) }
}
impl From<bool> for Node {
    fn from(b: bool) -> Self { Node::Lit(Value::Bool(b)) }
}
impl From<&str> for Node {
    fn from(s: &str) -> Self { Node::Lit(Value::String(s.to_string())) }
}
impl From<Prim> for Node {
    fn from(p: Prim) -> Self { Node::Prim(p) }
}
impl From<Record> for Node {
    fn from(r: Record) -> Self { Node::Record(r) }
}
impl From<Vec<Node>> for Node {
    fn from(xs: Vec<Node>) -> Self { Node::List(xs) }
}
impl From<Range> for Node {
    fn from(r: Range) -> Self { Node::Range(r) }
}
impl From<Deferred> for Node {
    fn from(d: Deferred) -> Self { Node::Deferred(d) }
}
impl From<FrozenDraw> for Node {
    fn from(f: FrozenDraw) -> Self { Node::Frozen(f) }
}
