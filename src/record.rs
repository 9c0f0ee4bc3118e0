//! Self-referential resolution.
//!
//! A record's deferred fields are resolved against the record itself, the
//! way a Nix `rec { }` set refers to its own attributes. One pass walks the
//! fields in order and writes each substitution back before moving on, so
//! later fields in the same pass already see it. Passes repeat until nothing
//! deferred remains, nothing changes any more, or the round budget runs out.
use std::collections::VecDeque;

use crate::config::{Config, PassOrder};
use crate::deferred::Resolution;
use crate::error::{Error, Result};
use crate::fmap::Fmap;
use crate::graph::{self, DependencyGraph};
use crate::node::{Node, Record};

impl Record {
    /// One resolution pass into a copy; `self` is left untouched.
    pub fn resolve_pass(&self, order: PassOrder) -> Result<Record> {
        let mut working = self.clone();
        let mut queue: VecDeque<String> = match order {
            PassOrder::Declared => self.names().cloned().collect(),
            PassOrder::Topological => DependencyGraph::of(self).pass_order().into(),
        };
        while let Some(name) = queue.pop_front() {
            let Some(node) = working.get(&name).cloned() else { continue };
            let resolved = node.try_fmap(&mut |leaf| resolve_leaf(leaf, &working))?;
            if working.get(&name) != Some(&resolved) {
                tracing::trace!(field = %name, "substituted");
            }
            working.insert(name, resolved);
        }
        Ok(working)
    }
}

/// Leaves resolve against `ctx`; everything except deferred expressions is
/// already as resolved as it gets.
pub(crate) fn resolve_leaf(leaf: Node, ctx: &Record) -> Result<Node> {
    match leaf {
        Node::Deferred(expr) => match expr.resolve(ctx)? {
            Resolution::Resolved(node) => Ok(node),
            Resolution::Deferred => Ok(Node::Deferred(expr)),
        },
        other => Ok(other),
    }
}

/// One pass over any root. Non-record roots resolve against an empty record.
pub fn resolve_pass(root: &Node, order: PassOrder) -> Result<Node> {
    match root {
        Node::Record(record) => record.resolve_pass(order).map(Node::Record),
        other => {
            let ctx = Record::new();
            other.clone().try_fmap(&mut |leaf| resolve_leaf(leaf, &ctx))
        }
    }
}

/// Resolve to a fixed point without drawing anything.
///
/// Succeeds once no deferred expression is left (ranges with concrete bounds
/// and type markers may remain; they are not computations). Fails with
/// `Cycle` or `Stalled` when a pass changes nothing, and with `Exhausted`
/// when `config.max_rounds` passes were not enough.
pub fn resolve(root: &Node, config: &Config) -> Result<Node> {
    let partial = resolve_partial(root, config)?;
    match partial.stopped {
        None => Ok(partial.node),
        Some(err) => Err(err),
    }
}

/// How far resolution got without drawing.
#[derive(Clone, Debug)]
pub struct Partial {
    /// The tree after the last pass.
    pub node: Node,
    /// Why deferred expressions remain in `node`, if they do.
    pub stopped: Option<Error>,
}

/// Like [`resolve`], but a cycle, stall or exhausted budget still hands back
/// the partially resolved tree. Errors from concrete operands still fail.
pub fn resolve_partial(root: &Node, config: &Config) -> Result<Partial> {
    let mut current = root.clone();
    for round in 1..=config.max_rounds {
        let next = resolve_pass(&current, config.order)?;
        let pending = next.deferred_paths();
        tracing::debug!(round, pending = pending.len(), "resolution pass");
        if pending.is_empty() {
            return Ok(Partial { node: next, stopped: None });
        }
        if next == current {
            let stopped = graph::diagnose(&next, pending);
            return Ok(Partial { node: next, stopped: Some(stopped) });
        }
        current = next;
    }
    let stopped = Error::Exhausted { rounds: config.max_rounds, fields: current.deferred_paths() };
    Ok(Partial { node: current, stopped: Some(stopped) })
}
