//! Structural map over schema trees.
//!
//! `fmap` applies a function to every leaf (literals, type markers, deferred
//! expressions) and rebuilds the containers around the results, keeping
//! field and index order. Node types with inner structure of their own
//! (ranges, frozen draws) decide how they are mapped.
use std::convert::Infallible;

use crate::node::{Node, Record};

pub trait Fmap: Sized {
    fn try_fmap<E, F>(self, f: &mut F) -> Result<Self, E>
    where
        F: FnMut(Node) -> Result<Node, E>;

    fn fmap<F>(self, mut f: F) -> Self
    where
        F: FnMut(Node) -> Node,
    {
        match self.try_fmap(&mut |node| Ok::<_, Infallible>(f(node))) {
            Ok(out) => out,
            Err(never) => match never {},
        }
    }
}

impl Fmap for Node {
    fn try_fmap<E, F>(self, f: &mut F) -> Result<Self, E>
    where
        F: FnMut(Node) -> Result<Node, E>,
    {
        match self {
            Node::Record(record) => record.try_fmap(f).map(Node::Record),
            Node::List(items) => items
                .into_iter()
                .map(|item| item.try_fmap(f))
                .collect::<Result<Vec<_>, E>>()
                .map(Node::List),
            Node::Range(range) => range.try_fmap(f).map(Node::Range),
            Node::Frozen(frozen) => frozen.try_fmap(f).map(Node::Frozen),
            leaf @ (Node::Lit(_) | Node::Prim(_) | Node::Deferred(_)) => f(leaf),
        }
    }
}

impl Fmap for Record {
    fn try_fmap<E, F>(mut self, f: &mut F) -> Result<Self, E>
    where
        F: FnMut(Node) -> Result<Node, E>,
    {
        for (_, node) in self.fields_mut() {
            let taken = std::mem::replace(node, Node::empty_record());
            *node = taken.try_fmap(f)?;
        }
        Ok(self)
    }
}
