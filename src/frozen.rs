//! Frozen list draws.
//!
//! A plain list is redrawn by every generation round, so a reference into it
//! would see a different list each time. A [`FrozenDraw`] draws its list once
//! at construction and from then on only ever hands out (and maps over) that
//! single draw.
use crate::config::Config;
use crate::draw::Drawer;
use crate::error::Result;
use crate::fmap::Fmap;
use crate::node::Node;
use crate::strategize::frozen_sequence;

#[derive(Clone, Debug, PartialEq)]
pub struct FrozenDraw {
    source: Vec<Node>,
    draw: Vec<Node>,
}

impl FrozenDraw {
    pub fn new(source: Vec<Node>, drawer: &mut Drawer, config: &Config) -> Result<Self> {
        let draw = drawer.draw(&frozen_sequence(&source, config)?)?;
        Ok(FrozenDraw { source, draw })
    }

    /// Freeze a draw taken elsewhere (inside a larger strategy).
    pub(crate) fn from_parts(source: Vec<Node>, draw: Vec<Node>) -> Self {
        FrozenDraw { source, draw }
    }

    /// The element schemas the draw was taken from.
    pub fn source(&self) -> &[Node] { &self.source }

    pub fn draw(&self) -> &[Node] { &self.draw }
}

impl Fmap for FrozenDraw {
    fn try_fmap<E, F>(self, f: &mut F) -> Result<Self, E>
    where
        F: FnMut(Node) -> Result<Node, E>,
    {
        let draw = self.draw.into_iter().map(|node| node.try_fmap(f)).collect::<Result<Vec<_>, E>>()?;
        Ok(FrozenDraw { source: self.source, draw })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{Prim, Record};
    use crate::strategize::strategize;
    use crate::validators::Range;
    use serde_json::Value;

    fn payments(drawer: &mut Drawer) -> FrozenDraw {
        let item = Record::new().field("amount", Range::new(4, 5)).field("paid", Prim::Bool);
        FrozenDraw::new(vec![item.into()], drawer, &Config::default()).unwrap()
    }

    #[test]
    fn draws_concrete_items_once() {
        let frozen = payments(&mut Drawer::seeded(3));
        for item in frozen.draw() {
            let value = item.to_value().unwrap();
            let amount = value["amount"].as_i64().unwrap();
            assert!((4..=5).contains(&amount));
            assert!(value["paid"].is_boolean());
        }
        assert_eq!(frozen.source().len(), 1);
    }

    #[test]
    fn generator_never_redraws() {
        let mut drawer = Drawer::seeded(11);
        let frozen = payments(&mut drawer);
        let node = Node::Frozen(frozen.clone());
        let strategy = strategize(&node, &Config::default()).unwrap();
        for _ in 0..10 {
            assert_eq!(drawer.draw(&strategy).unwrap(), node);
        }
    }

    #[test]
    fn repeated_maps_transform_the_same_draw() {
        let frozen = payments(&mut Drawer::seeded(5));
        let before: Vec<Value> = frozen.draw().iter().map(|n| n.to_value().unwrap()).collect();
        let bump = |node: Node| match node {
            Node::Lit(Value::Number(n)) => Node::from(n.as_i64().unwrap() + 100),
            other => other,
        };
        let twice = frozen.fmap(bump).fmap(bump);
        let after: Vec<Value> = twice.draw().iter().map(|n| n.to_value().unwrap()).collect();
        assert_eq!(before.len(), after.len());
        for (b, a) in before.iter().zip(&after) {
            assert_eq!(a["amount"].as_i64().unwrap(), b["amount"].as_i64().unwrap() + 200);
            assert_eq!(a["paid"], b["paid"]);
        }
    }
}
