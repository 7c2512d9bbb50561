//! Dependency ordering of registry instances.

use std::collections::{BTreeSet, HashSet};

use indexmap::IndexMap;
use log::trace;
use petgraph::{algo::tarjan_scc, graph::DiGraph};

/// Instances depending on each other, in registry order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Cycle(pub(crate) Vec<String>);

impl Cycle {
    /// `a -> b -> a`
    pub(crate) fn describe(&self) -> String {
        let mut names = self.0.clone();
        names.extend(self.0.first().cloned());
        names.join(" -> ")
    }
}

/// Order `deps` so every instance follows the instances it depends on.
///
/// Instances without pending dependencies keep their registry order.
pub(crate) fn order(deps: &IndexMap<String, BTreeSet<String>>) -> Result<Vec<String>, Cycle> {
    let mut ordered: Vec<String> = Vec::with_capacity(deps.len());
    let mut placed: HashSet<&str> = HashSet::new();
    let mut remaining: Vec<&str> = deps.keys().map(String::as_str).collect();

    while !remaining.is_empty() {
        let before = remaining.len();
        remaining.retain(|fqn| {
            let ready = deps[*fqn]
                .iter()
                .all(|dep| placed.contains(dep.as_str()) || !deps.contains_key(dep));
            if ready {
                placed.insert(*fqn);
                ordered.push(fqn.to_string());
            }
            !ready
        });
        if remaining.len() == before {
            return Err(find_cycle(deps, &remaining));
        }
    }
    trace!(order:? = ordered; "Registry ordered");
    Ok(ordered)
}

fn find_cycle(deps: &IndexMap<String, BTreeSet<String>>, remaining: &[&str]) -> Cycle {
    let mut graph = DiGraph::<&str, ()>::new();
    let nodes: IndexMap<&str, _> = remaining
        .iter()
        .map(|fqn| (*fqn, graph.add_node(*fqn)))
        .collect();
    for (fqn, node) in &nodes {
        for dep in &deps[*fqn] {
            if let Some(target) = nodes.get(dep.as_str()) {
                graph.add_edge(*node, *target, ());
            }
        }
    }

    let component = tarjan_scc(&graph)
        .into_iter()
        .find(|component| {
            component.len() > 1
                || component
                    .first()
                    .is_some_and(|node| graph.contains_edge(*node, *node))
        })
        .unwrap_or_default();

    let mut names: Vec<String> = component.iter().map(|node| graph[*node].to_string()).collect();
    names.sort_by_key(|name| nodes.get_index_of(name.as_str()));
    if names.is_empty() {
        names = remaining.iter().map(|fqn| fqn.to_string()).collect();
    }
    Cycle(names)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deps(edges: &[(&str, &[&str])]) -> IndexMap<String, BTreeSet<String>> {
        edges
            .iter()
            .map(|(fqn, deps)| {
                (
                    fqn.to_string(),
                    deps.iter().map(|dep| dep.to_string()).collect(),
                )
            })
            .collect()
    }

    #[test]
    fn test_dependencies_come_first() {
        let order = order(&deps(&[("a", &["c"]), ("b", &[]), ("c", &["b"])])).unwrap();
        assert_eq!(order, ["b", "c", "a"]);
    }

    #[test]
    fn test_registry_order_is_kept() {
        let order = order(&deps(&[("x", &[]), ("y", &["unknown"]), ("z", &[])])).unwrap();
        assert_eq!(order, ["x", "y", "z"]);
    }

    #[test]
    fn test_cycle_is_named() {
        let cycle = order(&deps(&[
            ("free", &[]),
            ("a", &["b"]),
            ("b", &["a"]),
            ("tail", &["a"]),
        ]))
        .unwrap_err();
        assert_eq!(cycle.describe(), "a -> b -> a");
    }

    #[test]
    fn test_self_cycle() {
        let cycle = order(&deps(&[("a", &["a"])])).unwrap_err();
        assert_eq!(cycle.0, ["a"]);
    }
}
