//! Range validator: a predicate over numbers, and a generator once its
//! bounds are concrete.
use proptest::prelude::*;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::fmap::Fmap;
use crate::node::Node;
use crate::num::Num;
use crate::path::Path;

/// `min <= v <= max`, each side optional. Bounds are arbitrary nodes, so a
/// bound may be a reference that only becomes a number later.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Range {
    pub min: Option<Box<Node>>,
    pub max: Option<Box<Node>>,
}

/// Concrete bounds.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Bounds {
    pub min: Option<Num>,
    pub max: Option<Num>,
}

impl Range {
    pub fn new(min: impl Into<Node>, max: impl Into<Node>) -> Self {
        Range { min: Some(Box::new(min.into())), max: Some(Box::new(max.into())) }
    }
    pub fn at_least(min: impl Into<Node>) -> Self {
        Range { min: Some(Box::new(min.into())), max: None }
    }
    pub fn at_most(max: impl Into<Node>) -> Self {
        Range { min: None, max: Some(Box::new(max.into())) }
    }

    pub fn bounds_iter(&self) -> impl Iterator<Item = &Node> {
        self.min.iter().chain(self.max.iter()).map(Box::as_ref)
    }

    /// `Ok(None)` while some present bound is still pending.
    pub fn bounds(&self) -> Result<Option<Bounds>> {
        let (Some(min), Some(max)) = (bound(self.min.as_deref())?, bound(self.max.as_deref())?) else {
            return Ok(None);
        };
        Ok(Some(Bounds { min, max }))
    }

    /// Predicate use: accept `v` or report why not.
    pub fn check(&self, v: &Value, at: &Path) -> Result<()> {
        let Some(bounds) = self.bounds()? else {
            return Err(Error::invalid(at, v, "range bounds could not be resolved"));
        };
        let Some(n) = Num::from_value(v) else {
            return Err(Error::invalid(at, v, "expected a number"));
        };
        if bounds.contains(n) {
            Ok(())
        } else {
            Err(Error::invalid(at, v, format!("outside {bounds}")))
        }
    }
}

/// Outer `None`: pending. Inner `None`: unset (absent or `null`).
fn bound(node: Option<&Node>) -> Result<Option<Option<Num>>> {
    match node {
        None | Some(Node::Lit(Value::Null)) => Ok(Some(None)),
        Some(Node::Lit(Value::Number(n))) => Ok(Some(Some(Num::from_number(n)))),
        Some(n) if n.is_pending() => Ok(None),
        Some(n) => Err(Error::Type(format!("range bound is a {}, expected a number", n.kind()))),
    }
}

impl Bounds {
    pub fn contains(&self, n: Num) -> bool {
        self.min.is_none_or(|min| n.total_cmp(min).is_ge()) && self.max.is_none_or(|max| n.total_cmp(max).is_le())
    }

    /// Uniform integers over the bounds, open on a missing side.
    pub fn integers(&self) -> Result<BoxedStrategy<i64>> {
        if self.min.is_none() && self.max.is_none() {
            return Ok(any::<i64>().boxed());
        }
        let lo = self.min.map_or(i64::MIN, Num::ceil_i64);
        let hi = self.max.map_or(i64::MAX, Num::floor_i64);
        if lo > hi {
            return Err(Error::EmptyRange { min: lo, max: hi });
        }
        Ok((lo..=hi).boxed())
    }
}

impl std::fmt::Display for Bounds {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let side = |n: Option<Num>, open: &'static str| n.map_or(open.to_string(), |n| n.into_value().to_string());
        write!(f, "[{}, {}]", side(self.min, "-inf"), side(self.max, "+inf"))
    }
}

impl Fmap for Range {
    fn try_fmap<E, F>(self, f: &mut F) -> Result<Self, E>
    where
        F: FnMut(Node) -> Result<Node, E>,
    {
        let min = match self.min {
            Some(node) => Some(Box::new(node.try_fmap(f)?)),
            None => None,
        };
        let max = match self.max {
            Some(node) => Some(Box::new(node.try_fmap(f)?)),
            None => None,
        };
        Ok(Range { min, max })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deferred::Deferred;
    use proptest::strategy::ValueTree;
    use proptest::test_runner::TestRunner;
    use serde_json::json;

    #[test]
    fn checks_both_bounds_inclusively() {
        let range = Range::new(4, 5);
        let at = Path::root();
        assert!(range.check(&json!(4), &at).is_ok());
        assert!(range.check(&json!(5), &at).is_ok());
        assert!(matches!(range.check(&json!(6), &at), Err(Error::Invalid { .. })));
        assert!(matches!(range.check(&json!(3.9), &at), Err(Error::Invalid { .. })));
        assert!(matches!(range.check(&json!("4"), &at), Err(Error::Invalid { .. })));
        assert!(Range::at_most(0).check(&json!(-100), &at).is_ok());
    }

    #[test]
    fn reference_bounds_are_pending() {
        let range = Range::at_most(Deferred::reference("init_state.balance").unwrap());
        assert_eq!(range.bounds().unwrap(), None);
        assert!(Range::new(1, Value::Null).bounds().unwrap().is_some());
        assert!(Range::new("a", 2).bounds().is_err());
    }

    #[test]
    fn inverted_bounds_are_an_empty_range() {
        let bounds = Range::new(5, 4).bounds().unwrap().unwrap();
        assert!(matches!(bounds.integers(), Err(Error::EmptyRange { min: 5, max: 4 })));
    }

    proptest! {
        #[test]
        fn drawn_integers_respect_concrete_bounds(lo in -1000i64..1000, width in 0i64..1000) {
            let bounds = Range::new(lo, lo + width).bounds().unwrap().unwrap();
            let strategy = bounds.integers().unwrap();
            let mut runner = TestRunner::default();
            for _ in 0..16 {
                let v = strategy.new_tree(&mut runner).unwrap().current();
                prop_assert!(lo <= v && v <= lo + width);
            }
        }
    }
}
