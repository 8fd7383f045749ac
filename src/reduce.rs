//! Graph reduction: threshold and path pruning, subtree extraction.

use std::collections::{BTreeSet, HashMap, VecDeque};

use crate::{
    Function, FunctionId, GraphError, GraphResult, Profile, PruneOptions, TIME_RATIO,
    TOTAL_TIME_RATIO,
};

/// A known filename must start with one of `paths` and a known module must contain one.
fn within_paths(function: &Function, paths: &[String]) -> bool {
    if let Some(filename) = &function.filename
        && !paths.iter().any(|p| filename.starts_with(p.as_str()))
    {
        return false;
    }
    if let Some(module) = &function.module
        && !paths.iter().any(|p| module.contains(p.as_str()))
    {
        return false;
    }
    true
}

impl Profile {
    /// Returns a pruned copy, leaving `self` untouched.
    pub fn pruned(&self, options: &PruneOptions) -> Profile {
        let mut copy = self.clone();
        copy.prune(options);
        copy
    }

    pub fn prune(&mut self, options: &PruneOptions) {
        let before = (self.functions.len(), self.call_count());
        self.assign_weights();

        self.functions
            .retain(|_, f| f.weight.is_none_or(|w| w >= options.node_thres));
        if !options.paths.is_empty() {
            self.functions.retain(|_, f| within_paths(f, &options.paths));
        }

        let kept: BTreeSet<FunctionId> = self.functions.keys().copied().collect();
        for function in self.functions.values_mut() {
            function.calls.retain(|callee, call| {
                kept.contains(callee) && call.weight.is_none_or(|w| w >= options.edge_thres)
            });
        }

        if options.color_nodes_by_selftime {
            self.color_by_selftime();
        }
        self.retain_cycles();
        tracing::debug!(
            functions_before = before.0,
            calls_before = before.1,
            functions = self.functions.len(),
            calls = self.call_count(),
            "pruned"
        );
    }

    /// Sets pruning weights from the total-time ratio.
    ///
    /// A call without its own total is weighted by the smaller of its caller's
    /// and callee's totals, which never underestimates the exact value.
    pub fn assign_weights(&mut self) {
        let totals: HashMap<FunctionId, f64> = self
            .functions
            .values()
            .filter_map(|f| f.events.get(TOTAL_TIME_RATIO).ok().map(|t| (f.id, t)))
            .collect();
        for function in self.functions.values_mut() {
            let own = totals.get(&function.id).copied();
            if own.is_some() {
                function.weight = own;
            }
            for call in function.calls.values_mut() {
                if let Ok(exact) = call.events.get(TOTAL_TIME_RATIO) {
                    call.weight = Some(exact);
                } else if let (Some(caller), Some(callee)) = (own, totals.get(&call.callee_id)) {
                    call.weight = Some(caller.min(*callee));
                }
            }
        }
    }

    /// Rescales function weights to self time relative to the largest self time.
    fn color_by_selftime(&mut self) {
        let max_ratio = self
            .functions
            .values()
            .filter_map(|f| f.events.get(TIME_RATIO).ok())
            .reduce(f64::max)
            .unwrap_or(1.0);
        if max_ratio == 0.0 {
            return;
        }
        for function in self.functions.values_mut() {
            if let Ok(self_time) = function.events.get(TIME_RATIO) {
                function.weight = Some(self_time / max_ratio);
            }
        }
    }

    /// Keeps only functions reachable from `roots` within `depth` calls.
    pub fn prune_root(&mut self, roots: &[FunctionId], depth: Option<usize>) -> GraphResult<()> {
        let callees: HashMap<FunctionId, Vec<FunctionId>> = self
            .functions
            .values()
            .map(|f| (f.id, f.calls.keys().copied().collect()))
            .collect();
        let kept = self.reachable(roots, depth, &callees)?;
        self.restrict_to(&kept);
        Ok(())
    }

    /// Keeps only functions that reach `leaves` within `depth` calls.
    pub fn prune_leaf(&mut self, leaves: &[FunctionId], depth: Option<usize>) -> GraphResult<()> {
        let mut callers: HashMap<FunctionId, Vec<FunctionId>> = HashMap::new();
        for function in self.functions.values() {
            for callee in function.calls.keys() {
                callers.entry(*callee).or_default().push(function.id);
            }
        }
        let kept = self.reachable(leaves, depth, &callers)?;
        self.restrict_to(&kept);
        Ok(())
    }

    /// Breadth-first, so a function is included at its shortest distance.
    fn reachable(
        &self,
        starts: &[FunctionId],
        depth: Option<usize>,
        edges: &HashMap<FunctionId, Vec<FunctionId>>,
    ) -> GraphResult<BTreeSet<FunctionId>> {
        let mut visited = BTreeSet::new();
        let mut queue = VecDeque::new();
        for &start in starts {
            if !self.functions.contains_key(&start) {
                return Err(GraphError::InvalidArgument(format!("unknown function id {start}")));
            }
            if visited.insert(start) {
                queue.push_back((start, depth));
            }
        }
        while let Some((id, remaining)) = queue.pop_front() {
            if remaining == Some(0) {
                continue;
            }
            for &next in edges.get(&id).into_iter().flatten() {
                if self.functions.contains_key(&next) && visited.insert(next) {
                    queue.push_back((next, remaining.map(|d| d - 1)));
                }
            }
        }
        Ok(visited)
    }

    fn restrict_to(&mut self, kept: &BTreeSet<FunctionId>) {
        self.functions.retain(|id, _| kept.contains(id));
        for function in self.functions.values_mut() {
            function.calls.retain(|callee, _| kept.contains(callee));
        }
        self.retain_cycles();
        tracing::debug!(functions = self.functions.len(), "extracted subtree");
    }
}
