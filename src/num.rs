use std::cmp::Ordering;

use ordered_float::OrderedFloat;
use serde_json::{Number, Value};

/// Arithmetic over JSON numbers: stays integral while it can, widens to f64
/// on overflow or when either side is a float.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    pub fn from_number(n: &Number) -> Num {
        if let Some(i) = n.as_i64() {
            Num::Int(i)
        } else {
            Num::Float(n.as_f64().unwrap_or(f64::NAN))
        }
    }

    pub fn from_value(v: &Value) -> Option<Num> {
        match v {
            Value::Number(n) => Some(Num::from_number(n)),
            _ => None,
        }
    }

    pub fn as_f64(self) -> f64 {
        match self {
            Num::Int(i) => i as f64,
            Num::Float(f) => f,
        }
    }

    pub fn add(self, other: Num) -> Num {
        match (self, other) {
            (Num::Int(a), Num::Int(b)) => a.checked_add(b).map_or(Num::Float(a as f64 + b as f64), Num::Int),
            (a, b) => Num::Float(a.as_f64() + b.as_f64()),
        }
    }

    pub fn sub(self, other: Num) -> Num {
        match (self, other) {
            (Num::Int(a), Num::Int(b)) => a.checked_sub(b).map_or(Num::Float(a as f64 - b as f64), Num::Int),
            (a, b) => Num::Float(a.as_f64() - b.as_f64()),
        }
    }

    pub fn total_cmp(self, other: Num) -> Ordering {
        match (self, other) {
            (Num::Int(a), Num::Int(b)) => a.cmp(&b),
            (a, b) => OrderedFloat(a.as_f64()).cmp(&OrderedFloat(b.as_f64())),
        }
    }

    /// Smallest integer `>= self` (saturating).
    pub fn ceil_i64(self) -> i64 {
        match self {
            Num::Int(i) => i,
            Num::Float(f) => f.ceil() as i64,
        }
    }

    /// Largest integer `<= self` (saturating).
    pub fn floor_i64(self) -> i64 {
        match self {
            Num::Int(i) => i,
            Num::Float(f) => f.floor() as i64,
        }
    }

    pub fn into_value(self) -> Value {
        match self {
            Num::Int(i) => Value::from(i),
            // non-finite floats have no JSON form
            Num::Float(f) => Number::from_f64(f).map_or(Value::Null, Value::Number),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_arithmetic_widens_on_overflow() {
        assert_eq!(Num::Int(2).add(Num::Int(3)), Num::Int(5));
        assert_eq!(Num::Int(2).sub(Num::Int(3)), Num::Int(-1));
        assert!(matches!(Num::Int(i64::MAX).add(Num::Int(1)), Num::Float(_)));
        assert_eq!(Num::Int(1).add(Num::Float(0.5)), Num::Float(1.5));
    }

    #[test]
    fn compares_across_representations() {
        assert_eq!(Num::Int(5).total_cmp(Num::Float(5.0)), Ordering::Equal);
        assert_eq!(Num::Float(4.5).total_cmp(Num::Int(5)), Ordering::Less);
        assert_eq!(Num::Float(4.5).ceil_i64(), 5);
        assert_eq!(Num::Float(4.5).floor_i64(), 4);
    }
}
