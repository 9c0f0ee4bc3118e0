//! Schema to proptest strategy.
//!
//! [`strategize`] is the one-shot conversion: every node kind maps to the
//! generator it describes, and nodes that cannot be drawn yet (deferred
//! expressions, ranges with pending bounds) map to `Just` themselves.
//!
//! [`settle`] drives a schema to a concrete value by alternating resolution
//! passes with draws, chaining rounds with `prop_flat_map` so that each new
//! round is built from the values the previous round actually drew. A value
//! drawn in one round is carried unchanged into the next. Lists are drawn
//! before anything reads them and come out frozen, so references and
//! aggregates into a list keep seeing the same items.
use std::fmt::Debug;

use proptest::collection::vec;
use proptest::prelude::*;
use proptest::strategy::Union;
use serde_json::Value;

use crate::config::Config;
use crate::draw::Drawer;
use crate::error::{Error, Result};
use crate::frozen::FrozenDraw;
use crate::graph;
use crate::node::{Node, Prim, Record};
use crate::record::resolve_pass;

type NodeStrategy = BoxedStrategy<Node>;

/// The generator a node describes.
pub fn strategize(node: &Node, config: &Config) -> Result<NodeStrategy> {
    match node {
        Node::Lit(_) | Node::Deferred(_) | Node::Frozen(_) => Ok(Just(node.clone()).boxed()),
        Node::Prim(prim) => Ok(primitive(*prim)),
        Node::Record(record) => product(record, config, strategize),
        Node::List(items) => Ok(sequence(items, config)?.prop_map(Node::List).boxed()),
        Node::Range(range) => match range.bounds()? {
            Some(bounds) => Ok(bounds.integers()?.prop_map(Node::from).boxed()),
            None => Ok(Just(node.clone()).boxed()),
        },
    }
}

/// Lists of up to `max_list_len` items, each drawn from one of `items`.
pub fn sequence(items: &[Node], config: &Config) -> Result<BoxedStrategy<Vec<Node>>> {
    if items.is_empty() {
        return Ok(Just(Vec::new()).boxed());
    }
    let options = items.iter().map(|item| strategize(item, config)).collect::<Result<Vec<_>>>()?;
    Ok(vec(Union::new(options), 0..=config.max_list_len).boxed())
}

fn primitive(prim: Prim) -> NodeStrategy {
    match prim {
        Prim::Int => any::<i64>().prop_map(Node::from).boxed(),
        Prim::Float => (prop::num::f64::NORMAL | prop::num::f64::ZERO).prop_map(Node::from).boxed(),
        Prim::Text => any::<String>().prop_map(|s| Node::Lit(Value::String(s))).boxed(),
        Prim::Bool => any::<bool>().prop_map(Node::from).boxed(),
    }
}

/// Fields are drawn independently; an optional field is dropped half the
/// time. Drawn records mark nothing optional, so presence is decided once.
fn product(
    record: &Record,
    config: &Config,
    each: fn(&Node, &Config) -> Result<NodeStrategy>,
) -> Result<NodeStrategy> {
    let mut names = Vec::with_capacity(record.len());
    let mut fields = Vec::with_capacity(record.len());
    for (name, node) in record.iter() {
        let field = each(node, config)?;
        let field = if record.is_optional(name) {
            prop_oneof![Just(None), field.prop_map(Some)].boxed()
        } else {
            field.prop_map(Some).boxed()
        };
        names.push(name.clone());
        fields.push(field);
    }
    Ok(all(fields)
        .prop_map(move |drawn| {
            Node::Record(names.iter().zip(drawn).filter_map(|(name, node)| Some((name.clone(), node?))).collect())
        })
        .boxed())
}

/// Product of independently drawn parts, in order.
fn all<T: Clone + Debug + 'static>(parts: Vec<BoxedStrategy<T>>) -> BoxedStrategy<Vec<T>> {
    let len = parts.len();
    parts.into_iter().fold(Just(Vec::with_capacity(len)).boxed(), |acc, part| {
        (acc, part)
            .prop_map(|(mut drawn, next)| {
                drawn.push(next);
                drawn
            })
            .boxed()
    })
}

// ------------------------------- Settle ---------------------------------- //

/// Draw, resolve, repeat until nothing is left to draw.
///
/// Yields `Ok` with a concrete tree, or the error that ended the chain: a
/// cycle or stall when a round makes no progress, `Exhausted` after
/// `config.max_rounds` draws.
pub fn settle(schema: Node, config: Config) -> BoxedStrategy<Result<Node>> {
    round(schema, 0, config)
}

fn round(node: Node, done: usize, config: Config) -> BoxedStrategy<Result<Node>> {
    let drawn = match draw_pending(&node, &config) {
        Ok(strategy) => strategy,
        Err(err) => return Just(Err(err)).boxed(),
    };
    tracing::debug!(round = done + 1, pending = node.pending_paths().len(), "drawing");
    drawn
        .prop_flat_map(move |next| after_draw(next, node.clone(), done + 1, config.clone()))
        .boxed()
}

/// Resolve what the last draw made computable, then stop or go again.
/// `before` is the tree the round started from.
fn after_draw(drawn: Node, before: Node, done: usize, config: Config) -> BoxedStrategy<Result<Node>> {
    let resolved = match resolve_pass(&drawn, config.order) {
        Ok(resolved) => resolved,
        Err(err) => return Just(Err(err)).boxed(),
    };
    if !resolved.needs_draw() {
        tracing::debug!(rounds = done, "settled");
        return Just(Ok(resolved)).boxed();
    }
    if resolved == before {
        let pending = resolved.pending_paths();
        return Just(Err(graph::diagnose(&resolved, pending))).boxed();
    }
    if done >= config.max_rounds {
        return Just(Err(Error::Exhausted { rounds: done, fields: resolved.pending_paths() })).boxed();
    }
    round(resolved, done, config)
}

/// Like [`strategize`], but subtrees with nothing left to draw are kept as
/// they are and every list comes out frozen.
fn draw_pending(node: &Node, config: &Config) -> Result<NodeStrategy> {
    if !node.needs_draw() {
        return Ok(Just(node.clone()).boxed());
    }
    match node {
        Node::Record(record) => product(record, config, draw_pending),
        Node::List(items) => {
            let source = items.clone();
            Ok(frozen_sequence(items, config)?
                .prop_map(move |draw| Node::Frozen(FrozenDraw::from_parts(source.clone(), draw)))
                .boxed())
        }
        Node::Frozen(frozen) => {
            let items = frozen.draw().iter().map(|item| draw_pending(item, config)).collect::<Result<Vec<_>>>()?;
            let source = frozen.source().to_vec();
            Ok(all(items).prop_map(move |draw| Node::Frozen(FrozenDraw::from_parts(source.clone(), draw))).boxed())
        }
        other => strategize(other, config),
    }
}

/// [`sequence`] whose items hold no unfrozen lists and no undecided
/// optional fields.
pub(crate) fn frozen_sequence(items: &[Node], config: &Config) -> Result<BoxedStrategy<Vec<Node>>> {
    if items.is_empty() {
        return Ok(Just(Vec::new()).boxed());
    }
    let options = items.iter().map(|item| draw_pending(item, config)).collect::<Result<Vec<_>>>()?;
    Ok(vec(Union::new(options), 0..=config.max_list_len).boxed())
}

/// Draw one settled example and convert it to JSON.
pub fn example(schema: &Node, drawer: &mut Drawer, config: &Config) -> Result<Value> {
    drawer.draw(&settle(schema.clone(), config.clone()))??.to_value()
}
