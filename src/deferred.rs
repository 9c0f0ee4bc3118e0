//! Deferred value expressions.
//!
//! Each expression resolves against the top-level record it lives in. When
//! an operand is not computable yet (still a range, a type marker, another
//! deferred expression, or a missing path) resolution answers
//! [`Resolution::Deferred`] and the expression is retried on a later round.
//! Operands that are concrete but of the wrong kind are errors.
use std::fmt;

use serde::Deserialize;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::node::{Node, Record};
use crate::num::Num;
use crate::path::{Lookup, Path};

#[derive(Clone, Debug, PartialEq)]
pub enum Resolution {
    Resolved(Node),
    Deferred,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Deferred {
    Const(Value),
    /// Whatever lives at the path, as soon as it is not itself deferred.
    Ref(Path),
    /// Like `Ref`, but also waits while the target is still undrawn (a range
    /// or a type marker).
    DefRef(Path),
    Sum(Vec<Deferred>),
    Difference(Box<Deferred>, Box<Deferred>),
    ListAggregate(ListAggregate),
}

/// `agg` over the items of the list field `list`, optionally projected
/// through `item` and filtered by `predicate`.
#[derive(Clone, Debug, PartialEq)]
pub struct ListAggregate {
    pub agg: Aggregate,
    pub list: Path,
    pub item: Option<Path>,
    pub predicate: Predicate,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregate {
    Sum,
    Count,
    Min,
    Max,
}

/// Item filters for list aggregates. Paths are relative to the item.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Predicate {
    #[default]
    Always,
    /// The item field is truthy.
    Field(Path),
    Equals(Path, Value),
    Not(Box<Predicate>),
}

// ---------------------------- Construction ------------------------------- //

impl Deferred {
    pub fn constant(v: impl Into<Value>) -> Self { Deferred::Const(v.into()) }

    pub fn reference(path: &str) -> Result<Self> { Ok(Deferred::Ref(Path::parse(path)?)) }

    pub fn deferred_reference(path: &str) -> Result<Self> { Ok(Deferred::DefRef(Path::parse(path)?)) }

    pub fn sum(terms: impl IntoIterator<Item = Deferred>) -> Self { Deferred::Sum(terms.into_iter().collect()) }

    pub fn difference(minuend: impl Into<Deferred>, subtrahend: impl Into<Deferred>) -> Self {
        Deferred::Difference(Box::new(minuend.into()), Box::new(subtrahend.into()))
    }

    /// `item_path` is `list` or `list.field...`.
    pub fn aggregate(agg: Aggregate, item_path: &str, predicate: Predicate) -> Result<Self> {
        let (list, item) = Path::parse(item_path)?.split_head().ok_or_else(|| Error::BadPath(item_path.to_string()))?;
        Ok(Deferred::ListAggregate(ListAggregate { agg, list, item, predicate }))
    }

    /// Absolute paths this expression reads.
    pub fn references(&self) -> Vec<&Path> {
        match self {
            Deferred::Const(_) => Vec::new(),
            Deferred::Ref(path) | Deferred::DefRef(path) => vec![path],
            Deferred::Sum(terms) => terms.iter().flat_map(Deferred::references).collect(),
            Deferred::Difference(a, b) => a.references().into_iter().chain(b.references()).collect(),
            Deferred::ListAggregate(agg) => vec![&agg.list],
        }
    }
}

impl From<i64> for Deferred {
    fn from(i: i64) -> Self { Deferred::Const(Value::from(i)) }
}
impl From<f64> for Deferred {
    fn from(f: f64) -> Self { Deferred::Const(Num::Float(f).into_value()) }
}

impl Predicate {
    pub fn field(path: &str) -> Result<Self> { Ok(Predicate::Field(Path::parse(path)?)) }

    pub fn equals(path: &str, v: impl Into<Value>) -> Result<Self> { Ok(Predicate::Equals(Path::parse(path)?, v.into())) }

    pub fn negate(self) -> Self { Predicate::Not(Box::new(self)) }
}

// ----------------------------- Resolution -------------------------------- //

impl Deferred {
    pub fn resolve(&self, ctx: &Record) -> Result<Resolution> {
        match self {
            Deferred::Const(v) => Ok(Resolution::Resolved(Node::fixed(v.clone()))),
            Deferred::Ref(path) => Ok(match ctx.lookup(path)? {
                Lookup::Found(Node::Deferred(_)) | Lookup::Pending => Resolution::Deferred,
                Lookup::Found(node) => Resolution::Resolved(node.clone()),
                Lookup::Missing => Resolution::Resolved(Node::empty_record()),
            }),
            Deferred::DefRef(path) => Ok(match ctx.lookup(path)? {
                Lookup::Found(Node::Deferred(_) | Node::Range(_) | Node::Prim(_)) | Lookup::Pending => Resolution::Deferred,
                Lookup::Found(node) => Resolution::Resolved(node.clone()),
                Lookup::Missing => Resolution::Resolved(Node::empty_record()),
            }),
            Deferred::Sum(terms) => {
                let mut total = Num::Int(0);
                for term in terms {
                    match term.operand(ctx)? {
                        Some(n) => total = total.add(n),
                        None => return Ok(Resolution::Deferred),
                    }
                }
                Ok(Resolution::Resolved(Node::Lit(total.into_value())))
            }
            Deferred::Difference(minuend, subtrahend) => {
                match (minuend.operand(ctx)?, subtrahend.operand(ctx)?) {
                    (Some(a), Some(b)) => Ok(Resolution::Resolved(Node::Lit(a.sub(b).into_value()))),
                    _ => Ok(Resolution::Deferred),
                }
            }
            Deferred::ListAggregate(agg) => agg.resolve(ctx),
        }
    }

    fn operand(&self, ctx: &Record) -> Result<Option<Num>> {
        match self.resolve(ctx)? {
            Resolution::Deferred => Ok(None),
            Resolution::Resolved(node) => numeric(&node, self),
        }
    }
}

fn numeric(node: &Node, source: &dyn fmt::Display) -> Result<Option<Num>> {
    match node {
        Node::Lit(Value::Number(n)) => Ok(Some(Num::from_number(n))),
        n if n.is_pending() => Ok(None),
        n => Err(Error::Type(format!("`{source}` produced a {} where a number was expected", n.kind()))),
    }
}

impl ListAggregate {
    fn resolve(&self, ctx: &Record) -> Result<Resolution> {
        let items: &[Node] = match ctx.lookup(&self.list)? {
            Lookup::Missing => &[],
            Lookup::Pending => return Ok(Resolution::Deferred),
            Lookup::Found(node) => match node {
                Node::List(items) => items,
                Node::Frozen(frozen) => frozen.draw(),
                Node::Record(record) if record.is_empty() => &[],
                n if n.is_pending() => return Ok(Resolution::Deferred),
                n => {
                    return Err(Error::Type(format!(
                        "`{}` aggregates over `{}`, which is a {}",
                        Deferred::ListAggregate(self.clone()),
                        self.list,
                        n.kind()
                    )))
                }
            },
        };

        let mut selected = Vec::with_capacity(items.len());
        for item in items {
            match self.predicate.test(item)? {
                Some(true) => {}
                Some(false) => continue,
                None => return Ok(Resolution::Deferred),
            }
            let value = match &self.item {
                None => item,
                Some(path) => match item.lookup(path)? {
                    Lookup::Found(node) => node,
                    Lookup::Missing | Lookup::Pending => return Ok(Resolution::Deferred),
                },
            };
            selected.push(value);
        }
        self.agg.apply(&selected, self)
    }
}

impl Aggregate {
    pub fn name(self) -> &'static str {
        match self {
            Aggregate::Sum => "sum",
            Aggregate::Count => "count",
            Aggregate::Min => "min",
            Aggregate::Max => "max",
        }
    }

    fn apply(self, values: &[&Node], source: &ListAggregate) -> Result<Resolution> {
        if self == Aggregate::Count {
            return Ok(Resolution::Resolved(Node::from(values.len() as i64)));
        }
        let source = Deferred::ListAggregate(source.clone());
        let mut nums = Vec::with_capacity(values.len());
        for value in values {
            match numeric(value, &source)? {
                Some(n) => nums.push(n),
                None => return Ok(Resolution::Deferred),
            }
        }
        let out = match self {
            Aggregate::Sum => nums.into_iter().fold(Num::Int(0), Num::add).into_value(),
            Aggregate::Min => nums.into_iter().min_by(|a, b| a.total_cmp(*b)).map_or(Value::Null, Num::into_value),
            Aggregate::Max => nums.into_iter().max_by(|a, b| a.total_cmp(*b)).map_or(Value::Null, Num::into_value),
            Aggregate::Count => unreachable!("handled above"),
        };
        Ok(Resolution::Resolved(Node::Lit(out)))
    }
}

impl Predicate {
    /// `None` while the inspected item field is still pending.
    pub fn test(&self, item: &Node) -> Result<Option<bool>> {
        match self {
            Predicate::Always => Ok(Some(true)),
            Predicate::Field(path) => Ok(match item.lookup(path)? {
                Lookup::Missing => Some(false),
                Lookup::Pending => None,
                Lookup::Found(node) if node.is_pending() && !matches!(node, Node::Record(_)) => None,
                Lookup::Found(node) => Some(truthy(node)),
            }),
            Predicate::Equals(path, expected) => Ok(match item.lookup(path)? {
                Lookup::Missing => Some(false),
                Lookup::Pending => None,
                Lookup::Found(node) if node.is_pending() && !matches!(node, Node::Record(_)) => None,
                Lookup::Found(node) => Some(node.to_value().ok().as_ref() == Some(expected)),
            }),
            Predicate::Not(inner) => Ok(inner.test(item)?.map(|b| !b)),
        }
    }
}

fn truthy(node: &Node) -> bool {
    match node {
        Node::Lit(Value::Null) => false,
        Node::Lit(Value::Bool(b)) => *b,
        Node::Lit(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Node::Lit(Value::String(s)) => !s.is_empty(),
        Node::Record(record) => !record.is_empty(),
        Node::List(items) => !items.is_empty(),
        Node::Frozen(frozen) => !frozen.draw().is_empty(),
        _ => true,
    }
}

// ------------------------------- Display --------------------------------- //

impl fmt::Display for Deferred {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Deferred::Const(v) => write!(f, "{v}"),
            Deferred::Ref(path) => write!(f, "Ref({path})"),
            Deferred::DefRef(path) => write!(f, "DefRef({path})"),
            Deferred::Sum(terms) => {
                let terms: Vec<_> = terms.iter().map(ToString::to_string).collect();
                write!(f, "Sum({})", terms.join(", "))
            }
            Deferred::Difference(a, b) => write!(f, "Difference({a}, {b})"),
            Deferred::ListAggregate(agg) => match &agg.item {
                Some(item) => write!(f, "{}({}.{item})", agg.agg.name(), agg.list),
                None => write!(f, "{}({})", agg.agg.name(), agg.list),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validators::Range;
    use serde_json::json;

    fn resolved(expr: &Deferred, ctx: &Record) -> Value {
        match expr.resolve(ctx).unwrap() {
            Resolution::Resolved(node) => node.to_value().unwrap(),
            Resolution::Deferred => panic!("{expr} stayed deferred"),
        }
    }

    fn items(rows: &[(i64, bool)]) -> Node {
        Node::List(
            rows.iter()
                .map(|&(amount, status)| Node::from(Record::new().field("amount", amount).field("status", status)))
                .collect(),
        )
    }

    #[test]
    fn ref_reads_absolute_paths_and_missing_reads_empty() {
        let ctx = Record::new().field("container", Record::new().field("value", 4));
        assert_eq!(resolved(&Deferred::reference("container.value").unwrap(), &ctx), json!(4));
        assert_eq!(resolved(&Deferred::reference("nope.value").unwrap(), &ctx), json!({}));
    }

    #[test]
    fn ref_waits_on_deferred_targets() {
        let ctx = Record::new().field("a", Deferred::reference("b").unwrap()).field("b", 1);
        let expr = Deferred::reference("a").unwrap();
        assert_eq!(expr.resolve(&ctx).unwrap(), Resolution::Deferred);
    }

    #[test]
    fn defref_refuses_to_resolve_past_a_range() {
        let ctx = Record::new().field("a", Range::new(2, 4)).field("b", 3);
        assert_eq!(Deferred::deferred_reference("a").unwrap().resolve(&ctx).unwrap(), Resolution::Deferred);
        assert_eq!(resolved(&Deferred::deferred_reference("b").unwrap(), &ctx), json!(3));
        // a plain reference copies the range
        let plain = Deferred::reference("a").unwrap().resolve(&ctx).unwrap();
        assert_eq!(plain, Resolution::Resolved(Node::from(Range::new(2, 4))));
    }

    #[test]
    fn arithmetic_resolves_or_defers() {
        let ctx = Record::new().field("a", 10).field("b", 4).field("r", Range::new(0, 1));
        let sum = Deferred::sum([Deferred::reference("a").unwrap(), Deferred::from(2i64), Deferred::reference("b").unwrap()]);
        assert_eq!(resolved(&sum, &ctx), json!(16));
        let diff = Deferred::difference(Deferred::reference("a").unwrap(), Deferred::reference("b").unwrap());
        assert_eq!(resolved(&diff, &ctx), json!(6));
        let pending = Deferred::difference(Deferred::reference("a").unwrap(), Deferred::reference("r").unwrap());
        assert_eq!(pending.resolve(&ctx).unwrap(), Resolution::Deferred);
        let missing = Deferred::sum([Deferred::reference("zzz").unwrap()]);
        assert_eq!(missing.resolve(&ctx).unwrap(), Resolution::Deferred);
    }

    #[test]
    fn arithmetic_on_a_string_is_a_type_error() {
        let ctx = Record::new().field("name", "bob");
        let sum = Deferred::sum([Deferred::reference("name").unwrap(), Deferred::from(1i64)]);
        assert!(matches!(sum.resolve(&ctx), Err(Error::Type(_))));
    }

    #[test]
    fn filtered_list_sum() {
        let ctx = Record::new().field("items", items(&[(3, true), (5, false), (7, true)]));
        let agg = Deferred::aggregate(Aggregate::Sum, "items.amount", Predicate::field("status").unwrap()).unwrap();
        assert_eq!(resolved(&agg, &ctx), json!(10));
        let all = Deferred::aggregate(Aggregate::Sum, "items.amount", Predicate::Always).unwrap();
        assert_eq!(resolved(&all, &ctx), json!(15));
        let negated = Deferred::aggregate(Aggregate::Count, "items", Predicate::field("status").unwrap().negate()).unwrap();
        assert_eq!(resolved(&negated, &ctx), json!(1));
    }

    #[test]
    fn empty_list_and_all_false_predicate_sum_to_zero() {
        let empty = Record::new().field("items", items(&[]));
        let agg = Deferred::aggregate(Aggregate::Sum, "items.amount", Predicate::field("status").unwrap()).unwrap();
        assert_eq!(resolved(&agg, &empty), json!(0));
        let all_false = Record::new().field("items", items(&[(3, false), (4, false)]));
        assert_eq!(resolved(&agg, &all_false), json!(0));
        let max = Deferred::aggregate(Aggregate::Max, "items.amount", Predicate::Always).unwrap();
        assert_eq!(resolved(&max, &empty), Value::Null);
    }

    #[test]
    fn aggregate_waits_on_undrawn_items() {
        let ctx = Record::new().field(
            "items",
            vec![Node::from(Record::new().field("amount", Range::new(1, 2)).field("status", true))],
        );
        let agg = Deferred::aggregate(Aggregate::Sum, "items.amount", Predicate::Always).unwrap();
        assert_eq!(agg.resolve(&ctx).unwrap(), Resolution::Deferred);
        let over_range = Record::new().field("items", Range::new(1, 2));
        assert_eq!(agg.resolve(&over_range).unwrap(), Resolution::Deferred);
    }

    #[test]
    fn single_segment_aggregates_the_items_themselves() {
        let ctx = Record::new().field("xs", vec![Node::from(2), Node::from(9), Node::from(4)]);
        let min = Deferred::aggregate(Aggregate::Min, "xs", Predicate::Always).unwrap();
        assert_eq!(resolved(&min, &ctx), json!(2));
        let odd = Deferred::aggregate(Aggregate::Sum, "xs", Predicate::Always).unwrap();
        assert_eq!(resolved(&odd, &ctx), json!(15));
    }

    #[test]
    fn equals_predicate_compares_item_fields() {
        let ctx = Record::new().field("items", items(&[(3, true), (5, false)]));
        let agg = Deferred::aggregate(Aggregate::Sum, "items.amount", Predicate::equals("status", false).unwrap()).unwrap();
        assert_eq!(resolved(&agg, &ctx), json!(5));
    }
}
