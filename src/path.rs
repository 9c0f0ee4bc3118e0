//! Dot-delimited reference paths and the soft-failing deep lookup.
use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Error, Result};
use crate::node::{Node, Record};

static PATH_SYNTAX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9_\-]+(\.[A-Za-z0-9_\-]+)*$").expect("path regex is valid")
});

/// A key chain such as `init_state.balance`.
///
/// The empty path is the record root; it is never produced by parsing and
/// only shows up as the starting location of a tree walk.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Path(Vec<String>);

impl Path {
    pub fn root() -> Self { Self::default() }

    pub fn parse(src: &str) -> Result<Self> {
        if !PATH_SYNTAX.is_match(src) {
            return Err(Error::BadPath(src.to_string()));
        }
        Ok(Path(src.split('.').map(str::to_string).collect()))
    }

    #[cfg(test)]
    pub(crate) fn segments(&self) -> &[String] { &self.0 }
    pub fn head(&self) -> Option<&str> { self.0.first().map(String::as_str) }

    /// Split `a.b.c` into `a` and `b.c`.
    pub fn split_head(&self) -> Option<(Path, Option<Path>)> {
        let (head, rest) = self.0.split_first()?;
        let rest = if rest.is_empty() { None } else { Some(Path(rest.to_vec())) };
        Some((Path(vec![head.clone()]), rest))
    }

    pub fn child(&self, segment: impl ToString) -> Path {
        let mut out = self.clone();
        out.0.push(segment.to_string());
        out
    }

    pub fn starts_with(&self, prefix: &Path) -> bool { self.0.starts_with(&prefix.0) }

    /// True when one path is a prefix of the other: a lookup of either one
    /// touches the node stored at the other.
    pub fn overlaps(&self, other: &Path) -> bool {
        self.starts_with(other) || other.starts_with(self)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("<root>");
        }
        f.write_str(&self.0.join("."))
    }
}

impl FromStr for Path {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self> { Path::parse(s) }
}

// ------------------------------- Lookup ---------------------------------- //

/// Outcome of walking a path.
#[derive(Debug)]
pub enum Lookup<'a> {
    Found(&'a Node),
    /// Some segment was absent. Reads as an empty mapping.
    Missing,
    /// The walk reached a deferred node that may become traversable later.
    Pending,
}

impl Record {
    /// Walk `path` from this record. The first segment names one of its fields.
    pub fn lookup<'a>(&'a self, path: &Path) -> Result<Lookup<'a>> {
        let Some((first, rest)) = path.0.split_first() else {
            return Ok(Lookup::Missing);
        };
        match self.get(first) {
            Some(node) => descend(node, rest, path),
            None => Ok(Lookup::Missing),
        }
    }
}

impl Node {
    /// Walk `path` starting *inside* this node.
    pub fn lookup<'a>(&'a self, path: &Path) -> Result<Lookup<'a>> {
        descend(self, &path.0, path)
    }
}

fn descend<'a>(start: &'a Node, segments: &[String], path: &Path) -> Result<Lookup<'a>> {
    let mut current = start;
    for segment in segments {
        current = match current {
            Node::Record(record) => match record.get(segment) {
                Some(next) => next,
                None => return Ok(Lookup::Missing),
            },
            Node::Deferred(_) => return Ok(Lookup::Pending),
            other => {
                return Err(Error::NotTraversable {
                    path: path.clone(),
                    segment: segment.clone(),
                    found: other.kind(),
                })
            }
        };
    }
    Ok(Lookup::Found(current))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deferred::Deferred;

    #[test]
    fn parses_dotted_paths() {
        let path = Path::parse("init_state.balance").unwrap();
        assert_eq!(path.segments(), ["init_state", "balance"]);
        assert_eq!(path.to_string(), "init_state.balance");
        assert!(Path::parse("").is_err());
        assert!(Path::parse("a..b").is_err());
        assert!(Path::parse("a b").is_err());
    }

    #[test]
    fn missing_segments_read_as_missing() {
        let record = Record::new().field("container", Record::new().field("value", 4));
        let hit = record.lookup(&Path::parse("container.value").unwrap()).unwrap();
        assert!(matches!(hit, Lookup::Found(Node::Lit(v)) if v == 4));
        let miss = record.lookup(&Path::parse("container.nope.deeper").unwrap()).unwrap();
        assert!(matches!(miss, Lookup::Missing));
    }

    #[test]
    fn traversing_through_a_deferred_node_is_pending() {
        let record = Record::new().field("a", Deferred::reference("b").unwrap());
        let out = record.lookup(&Path::parse("a.x").unwrap()).unwrap();
        assert!(matches!(out, Lookup::Pending));
    }

    #[test]
    fn traversing_through_a_scalar_is_an_error() {
        let record = Record::new().field("a", 4);
        let err = record.lookup(&Path::parse("a.x").unwrap()).unwrap_err();
        assert!(matches!(err, Error::NotTraversable { .. }));
    }
}
