//! Recursion detection over the call graph.
//!
//! The graph is handed to petgraph's Kosaraju pass, which walks it with an
//! explicit stack so that deep call chains cannot exhaust the thread stack.

use petgraph::algo::kosaraju_scc;
use petgraph::graph::{DiGraph, NodeIndex};

use std::collections::{BTreeMap, HashMap};

use crate::{Function, FunctionId, GraphResult, Profile};

/// Directed call graph over the functions accepted by `include`.
///
/// Edges run caller -> callee; calls leaving the included set are dropped.
pub(crate) fn call_graph(
    functions: &BTreeMap<FunctionId, Function>,
    include: impl Fn(&Function) -> bool,
) -> (DiGraph<FunctionId, ()>, HashMap<FunctionId, NodeIndex>) {
    let mut graph = DiGraph::<FunctionId, ()>::with_capacity(functions.len(), 0);
    let mut nodes = HashMap::with_capacity(functions.len());
    for function in functions.values().filter(|f| include(*f)) {
        nodes.insert(function.id, graph.add_node(function.id));
    }
    for function in functions.values() {
        let Some(&from) = nodes.get(&function.id) else {
            continue;
        };
        for callee in function.calls.keys() {
            if let Some(&to) = nodes.get(callee) {
                graph.add_edge(from, to, ());
            }
        }
    }
    (graph, nodes)
}

/// Strongly connected components of the call graph.
///
/// Components are emitted callees-first: every component appears after all
/// components reachable from it. Members of a component are in id order.
/// Calls to ids missing from `functions` are ignored.
pub fn strongly_connected_components(
    functions: &BTreeMap<FunctionId, Function>,
) -> Vec<Vec<FunctionId>> {
    let (graph, _) = call_graph(functions, |_| true);
    kosaraju_scc(&graph)
        .into_iter()
        .map(|component| {
            let mut members: Vec<FunctionId> =
                component.into_iter().map(|node| graph[node]).collect();
            members.sort();
            members
        })
        .collect()
}

impl Profile {
    /// Rebuilds cycle membership from the current call graph.
    ///
    /// Components of two or more functions become cycles; a function calling
    /// only itself stays uncycled.
    pub fn find_cycles(&mut self) -> GraphResult<()> {
        self.clear_cycles();
        let components = strongly_connected_components(&self.functions);
        for members in components.into_iter().filter(|m| m.len() > 1) {
            let cycle = self.new_cycle();
            for member in members {
                self.add_to_cycle(cycle, member)?;
            }
        }
        tracing::debug!(
            functions = self.functions.len(),
            cycles = self.cycles.len(),
            "found cycles"
        );
        Ok(())
    }
}
