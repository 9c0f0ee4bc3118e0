//! Example generation for schemas whose fields refer to each other.
//!
//! A schema is a [`Node`] tree. Fields may hold [`Deferred`] expressions
//! (references, sums, differences, list aggregates) that read other fields of
//! the same top-level record, and [`Range`] validators whose bounds may be
//! such expressions. [`resolve`] computes what can be computed without
//! drawing; [`settle`] and [`example`] alternate resolution with proptest
//! draws until a concrete JSON value comes out.
//!
//! ```
//! use strategize::{Config, Deferred, Drawer, Node, Range, Record, example};
//!
//! let schema: Node = Record::new()
//!     .field("a", Range::new(2, 4))
//!     .field("b", Range::new(Deferred::deferred_reference("a").unwrap(), 10))
//!     .into();
//! let value = example(&schema, &mut Drawer::seeded(1), &Config::default()).unwrap();
//! assert!(value["a"].as_i64().unwrap() <= value["b"].as_i64().unwrap());
//! ```
pub mod config;
pub mod contract;
pub mod deferred;
pub mod draw;
pub mod error;
pub mod fmap;
pub mod frozen;
pub mod graph;
pub mod node;
pub mod num;
pub mod path;
pub mod path_de;
pub mod record;
pub mod schema;
pub mod strategize;
pub mod validate;
pub mod validators;

pub use config::{Config, PassOrder};
pub use contract::{Example, InputContract};
pub use deferred::{Aggregate, Deferred, Predicate, Resolution};
pub use draw::Drawer;
pub use error::{Error, Result};
pub use fmap::Fmap;
pub use frozen::FrozenDraw;
pub use node::{Node, Prim, Record};
pub use path::Path;
pub use record::{Partial, resolve, resolve_partial};
pub use strategize::{example, settle, strategize};
pub use validate::validate;
pub use validators::Range;
