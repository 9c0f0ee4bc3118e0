//! Dependency graphs over reference paths.
//!
//! Two granularities:
//! - field level, over the top-level fields of a record, used to order a
//!   resolution pass (Kahn's algorithm, dependencies first);
//! - location level, over the deferred leaves that are still unresolved,
//!   used to tell a true cycle apart from a field that is merely stuck.
use indexmap::{IndexMap, IndexSet};

use crate::error::Error;
use crate::node::{Node, Record};
use crate::path::Path;

/// Every deferred leaf's location paired with each absolute path it reads.
pub fn references(node: &Node) -> Vec<(Path, Path)> {
    let mut out = Vec::new();
    node.walk(&Path::root(), &mut |at, node| {
        if let Node::Deferred(expr) = node {
            for target in expr.references() {
                out.push((at.clone(), target.clone()));
            }
        }
    });
    out
}

// ----------------------------- Field graph ------------------------------- //

#[derive(Clone, Debug, Default)]
pub struct DependencyGraph {
    /// field -> top-level fields it reads (self-reads excluded)
    edges: IndexMap<String, IndexSet<String>>,
}

impl DependencyGraph {
    pub fn of(record: &Record) -> Self {
        let mut edges = IndexMap::new();
        for (name, node) in record.iter() {
            let reads: IndexSet<String> = references(node)
                .into_iter()
                .filter_map(|(_, target)| target.head().map(str::to_string))
                .filter(|head| head != name && record.get(head).is_some())
                .collect();
            edges.insert(name.clone(), reads);
        }
        DependencyGraph { edges }
    }

    #[cfg(test)]
    pub(crate) fn dependencies(&self, field: &str) -> impl Iterator<Item = &String> {
        self.edges.get(field).into_iter().flatten()
    }

    /// Kahn's algorithm. Ties keep declaration order. `Err` carries the
    /// fields that could not be scheduled (cycles and whatever waits on them).
    #[cfg(test)]
    pub(crate) fn topological_order(&self) -> Result<Vec<String>, Vec<String>> {
        let (order, stuck) = self.kahn();
        if stuck.is_empty() { Ok(order) } else { Err(stuck) }
    }

    /// Acyclic fields in dependency order, then the rest in declaration order.
    pub fn pass_order(&self) -> Vec<String> {
        let (mut order, stuck) = self.kahn();
        order.extend(stuck);
        order
    }

    fn kahn(&self) -> (Vec<String>, Vec<String>) {
        let mut in_degree: IndexMap<&str, usize> =
            self.edges.iter().map(|(name, reads)| (name.as_str(), reads.len())).collect();
        let mut dependents: IndexMap<&str, Vec<&str>> = IndexMap::new();
        for (name, reads) in &self.edges {
            for read in reads {
                dependents.entry(read.as_str()).or_default().push(name.as_str());
            }
        }

        let mut order = Vec::with_capacity(self.edges.len());
        let mut ready: Vec<&str> = in_degree.iter().filter(|(_, d)| **d == 0).map(|(n, _)| *n).collect();
        while !ready.is_empty() {
            let mut next = Vec::new();
            for name in ready {
                order.push(name.to_string());
                for dependent in dependents.get(name).into_iter().flatten() {
                    if let Some(degree) = in_degree.get_mut(dependent) {
                        *degree -= 1;
                        if *degree == 0 {
                            next.push(*dependent);
                        }
                    }
                }
            }
            next.sort_by_key(|name| in_degree.get_index_of(name));
            ready = next;
        }

        let stuck = in_degree.into_iter().filter(|(_, d)| *d > 0).map(|(n, _)| n.to_string()).collect();
        (order, stuck)
    }
}

// ---------------------------- Diagnostics -------------------------------- //

/// Explain why `root` stopped making progress: a cycle among its unresolved
/// leaves if there is one, otherwise the list of stuck `fields`.
pub fn diagnose(root: &Node, fields: Vec<Path>) -> Error {
    match find_cycle(&references(root)) {
        Some(cycle) => {
            let shown: Vec<String> = cycle.iter().map(ToString::to_string).collect();
            tracing::warn!(cycle = ?shown, "circular dependency");
            Error::Cycle { cycle }
        }
        None => {
            let shown: Vec<String> = fields.iter().map(ToString::to_string).collect();
            tracing::warn!(fields = ?shown, "resolution stalled");
            Error::Stalled { fields }
        }
    }
}

/// A leaf at `L` waits on a leaf at `M` when the path `L` reads overlaps `M`.
/// Returns the first cycle found, closed (`a -> b -> a`).
fn find_cycle(pending: &[(Path, Path)]) -> Option<Vec<Path>> {
    let locations: IndexSet<&Path> = pending.iter().map(|(at, _)| at).collect();
    let mut waits_on: IndexMap<&Path, IndexSet<&Path>> = IndexMap::new();
    for (at, target) in pending {
        let entry = waits_on.entry(at).or_default();
        for other in &locations {
            if target.overlaps(other) {
                entry.insert(*other);
            }
        }
    }

    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Unvisited,
        Active,
        Done,
    }
    let mut marks: IndexMap<&Path, Mark> = locations.iter().map(|at| (*at, Mark::Unvisited)).collect();

    fn visit<'a>(
        at: &'a Path,
        waits_on: &IndexMap<&'a Path, IndexSet<&'a Path>>,
        marks: &mut IndexMap<&'a Path, Mark>,
        stack: &mut Vec<&'a Path>,
    ) -> Option<Vec<Path>> {
        marks.insert(at, Mark::Active);
        stack.push(at);
        for &next in waits_on.get(at).into_iter().flatten() {
            match marks.get(next).copied().unwrap_or(Mark::Done) {
                Mark::Active => {
                    let start = stack.iter().position(|p| *p == next).unwrap_or(0);
                    let mut cycle: Vec<Path> = stack[start..].iter().map(|p| (*p).clone()).collect();
                    cycle.push(next.clone());
                    return Some(cycle);
                }
                Mark::Unvisited => {
                    if let Some(cycle) = visit(next, waits_on, marks, stack) {
                        return Some(cycle);
                    }
                }
                Mark::Done => {}
            }
        }
        stack.pop();
        marks.insert(at, Mark::Done);
        None
    }

    for &at in &locations {
        if marks.get(at).copied() == Some(Mark::Unvisited) {
            let mut stack = Vec::new();
            if let Some(cycle) = visit(at, &waits_on, &mut marks, &mut stack) {
                return Some(cycle);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deferred::Deferred;
    use crate::validators::Range;

    fn r(path: &str) -> Node { Deferred::reference(path).unwrap().into() }

    #[test]
    fn topological_order_puts_dependencies_first() {
        let record = Record::new().field("c", r("b")).field("b", r("a")).field("a", 1).field("d", 2);
        let graph = DependencyGraph::of(&record);
        assert_eq!(graph.topological_order().unwrap(), ["a", "d", "b", "c"]);
        assert_eq!(graph.dependencies("c").collect::<Vec<_>>(), ["b"]);
    }

    #[test]
    fn nested_and_bound_references_count_as_edges() {
        let record = Record::new()
            .field("event", Record::new().field("amount", Range::at_most(r("state.balance"))))
            .field("state", Record::new().field("balance", 3));
        let graph = DependencyGraph::of(&record);
        assert_eq!(graph.topological_order().unwrap(), ["state", "event"]);
    }

    #[test]
    fn self_references_within_a_field_are_not_edges() {
        let record = Record::new().field("a", Record::new().field("x", 1).field("y", r("a.x")));
        assert_eq!(DependencyGraph::of(&record).topological_order().unwrap(), ["a"]);
    }

    #[test]
    fn cycles_are_left_for_the_tail_of_the_pass() {
        let record = Record::new().field("a", r("b")).field("b", r("a")).field("c", 1);
        let graph = DependencyGraph::of(&record);
        assert_eq!(graph.topological_order().unwrap_err(), ["a", "b"]);
        assert_eq!(graph.pass_order(), ["c", "a", "b"]);
    }

    #[test]
    fn diagnoses_mutual_references_as_a_cycle() {
        let root = Node::from(Record::new().field("a", r("b")).field("b", r("a")));
        let err = diagnose(&root, root.deferred_paths());
        assert_eq!(err.to_string(), "circular dependency: a -> b -> a");
    }

    #[test]
    fn diagnoses_a_dangling_wait_as_stalled() {
        // waits on a range that pure resolution never draws
        let root = Node::from(Record::new().field("a", Range::new(1, 2)).field("b", Deferred::deferred_reference("a").unwrap()));
        let err = diagnose(&root, root.deferred_paths());
        assert!(matches!(err, Error::Stalled { ref fields } if fields.len() == 1));
    }
}
