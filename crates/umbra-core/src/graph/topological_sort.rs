// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! A stable variant of Kahn's algorithm.
//!
//! Among the nodes that are ready at any step, the one declared first wins, so
//! the result is deterministic and equals the declaration order whenever that
//! order already satisfies every edge.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::fmt;
use std::hash::Hash;

/// Failure of [`topological_sort`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SortError<T> {
    /// The graph contains at least one cycle; the nodes left unsorted are listed.
    Cycle(Vec<T>),
    /// An edge references a node that was not declared.
    UnknownNode(T),
}

impl<T: fmt::Debug> fmt::Display for SortError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortError::Cycle(nodes) => write!(f, "Dependency cycle among {nodes:?}"),
            SortError::UnknownNode(node) => write!(f, "Edge references undeclared node {node:?}"),
        }
    }
}

impl<T: fmt::Debug> std::error::Error for SortError<T> {}

/// Sorts `nodes` so that every `(parent, child)` edge has the parent first.
///
/// # Arguments
///
/// * `nodes`: The unique nodes, in declaration order.
/// * `edges`: Directed dependencies as `(parent, child)` tuples.
pub fn topological_sort<T>(
    nodes: impl IntoIterator<Item = T>,
    edges: impl IntoIterator<Item = (T, T)>,
) -> Result<Vec<T>, SortError<T>>
where
    T: Copy + Eq + Hash,
{
    let node_list: Vec<T> = nodes.into_iter().collect();
    let position: HashMap<T, usize> = node_list
        .iter()
        .enumerate()
        .map(|(i, node)| (*node, i))
        .collect();

    let mut children: Vec<Vec<usize>> = vec![Vec::new(); node_list.len()];
    let mut in_degree = vec![0usize; node_list.len()];

    for (parent, child) in edges {
        let p = *position.get(&parent).ok_or(SortError::UnknownNode(parent))?;
        let c = *position.get(&child).ok_or(SortError::UnknownNode(child))?;
        children[p].push(c);
        in_degree[c] += 1;
    }

    let mut ready: BinaryHeap<Reverse<usize>> = in_degree
        .iter()
        .enumerate()
        .filter(|(_, degree)| **degree == 0)
        .map(|(i, _)| Reverse(i))
        .collect();

    let mut sorted = Vec::with_capacity(node_list.len());
    while let Some(Reverse(index)) = ready.pop() {
        sorted.push(node_list[index]);
        for &child in &children[index] {
            in_degree[child] -= 1;
            if in_degree[child] == 0 {
                ready.push(Reverse(child));
            }
        }
    }

    if sorted.len() != node_list.len() {
        let remaining = node_list
            .iter()
            .enumerate()
            .filter(|(i, _)| in_degree[*i] > 0)
            .map(|(_, node)| *node)
            .collect();
        return Err(SortError::Cycle(remaining));
    }
    Ok(sorted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_graph_sorts_to_empty() {
        let sorted = topological_sort(Vec::<u8>::new(), Vec::new()).unwrap();
        assert!(sorted.is_empty());
    }

    #[test]
    fn keeps_declaration_order_when_valid() {
        let sorted = topological_sort(["a", "b", "c", "d"], [("a", "c"), ("b", "d")]).unwrap();
        assert_eq!(sorted, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn reorders_to_satisfy_edges() {
        let sorted = topological_sort(["ui", "cull", "gbuffer"], [("cull", "gbuffer"), ("gbuffer", "ui")])
            .unwrap();
        assert_eq!(sorted, vec!["cull", "gbuffer", "ui"]);
    }

    #[test]
    fn detects_cycles() {
        let err = topological_sort([1, 2, 3], [(1, 2), (2, 3), (3, 2)]).unwrap_err();
        assert_eq!(err, SortError::Cycle(vec![2, 3]));
    }

    #[test]
    fn rejects_unknown_nodes() {
        let err = topological_sort([1, 2], [(1, 7)]).unwrap_err();
        assert_eq!(err, SortError::UnknownNode(7));
    }
}
