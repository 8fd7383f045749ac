//! Total-time integration along the call graph.
//!
//! Components are processed callees-first (the order the SCC pass
//! emits them), so every callee total is known when its caller is reached.
//! A cycle is integrated as one unit: its aggregate total is computed first,
//! then the share entering through each entry point is spread over the
//! members by rank (hop distance from the entry), only ever flowing from a
//! lower rank to a higher one.

use petgraph::algo::dijkstra;

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::cycles::call_graph;
use crate::{
    CONSERVATION_TOLERANCE, Call, CycleId, Event, FunctionId, GraphError, GraphResult,
    PARTIAL_TOLERANCE, Profile, ratio, strongly_connected_components,
};

fn call_ratio(call: &Call) -> GraphResult<f64> {
    call.ratio.ok_or_else(|| {
        GraphError::Consistency(format!(
            "call to {} has no ratio; compute call ratios first",
            call.callee_id
        ))
    })
}

impl Profile {
    /// Propagates `inevent` (self cost) into `outevent` (total cost) for every
    /// function, cycle and call.
    ///
    /// Requires cycles and call ratios to be computed.
    pub fn integrate(&mut self, outevent: Event, inevent: Event) -> GraphResult<()> {
        if self.events.contains(outevent) {
            return Err(GraphError::Consistency(format!(
                "profile already integrated into {}",
                outevent.name()
            )));
        }
        let mut total = inevent.null();
        for function in self.functions.values() {
            if function.events.contains(outevent) {
                return Err(GraphError::Consistency(format!(
                    "function {} already has {}",
                    function.name,
                    outevent.name()
                )));
            }
            total = inevent.aggregate(total, function.events.get(inevent)?)?;
            for call in function.outgoing() {
                if call.events.contains(outevent) {
                    return Err(GraphError::Consistency(format!(
                        "call from {} already has {}",
                        function.name,
                        outevent.name()
                    )));
                }
                call_ratio(call)?;
            }
        }

        let cycle_inputs: Vec<(CycleId, f64)> = self
            .cycles
            .values()
            .map(|cycle| -> GraphResult<(CycleId, f64)> {
                let mut sum = inevent.null();
                for member in &cycle.functions {
                    sum = inevent.aggregate(sum, self.function(*member)?.events.get(inevent)?)?;
                }
                Ok((cycle.id, sum))
            })
            .collect::<GraphResult<_>>()?;
        for (id, sum) in cycle_inputs {
            if let Some(cycle) = self.cycles.get_mut(&id) {
                cycle.events.insert(inevent, sum);
            }
        }

        for component in strongly_connected_components(&self.functions) {
            let cycle = self.cycle_of(component[0]);
            if component.len() > 1 && component.iter().any(|id| self.cycle_of(*id) != cycle) {
                return Err(GraphError::Consistency(
                    "cycle membership is stale; find cycles before integrating".to_string(),
                ));
            }
            match cycle {
                Some(cycle) => {
                    let done = self
                        .cycles
                        .get(&cycle)
                        .is_some_and(|c| c.events.contains(outevent));
                    if !done {
                        self.integrate_cycle(cycle, outevent, inevent)?;
                    }
                }
                None => self.integrate_function(component[0], outevent, inevent)?,
            }
        }

        self.events.insert(outevent, total);
        tracing::debug!(
            functions = self.functions.len(),
            cycles = self.cycles.len(),
            event = outevent.name(),
            "integrated"
        );
        Ok(())
    }

    /// Total of the unit `id` belongs to: its cycle when it has one.
    fn unit_total(&self, id: FunctionId, outevent: Event) -> GraphResult<f64> {
        let value = match self.cycle_of(id) {
            Some(cycle) => self
                .cycles
                .get(&cycle)
                .ok_or_else(|| GraphError::Consistency(format!("unknown {cycle}")))?
                .events
                .get(outevent),
            None => self.function(id)?.events.get(outevent),
        };
        value.map_err(|_| {
            GraphError::Consistency(format!("callee {id} reached before it was integrated"))
        })
    }

    fn integrate_function(
        &mut self,
        id: FunctionId,
        outevent: Event,
        inevent: Event,
    ) -> GraphResult<()> {
        let function = self.function(id)?;
        let mut total = function.events.get(inevent)?;
        let mut call_totals = Vec::new();
        for call in function.outgoing() {
            let subtotal = call_ratio(call)? * self.unit_total(call.callee_id, outevent)?;
            call_totals.push((call.callee_id, subtotal));
            total += subtotal;
        }

        let function = self.function_mut(id)?;
        function.events.insert(outevent, total);
        for (callee, subtotal) in call_totals {
            if let Some(call) = function.calls.get_mut(&callee) {
                call.events.insert(outevent, subtotal);
            }
        }
        Ok(())
    }

    fn integrate_cycle(&mut self, cycle: CycleId, outevent: Event, inevent: Event) -> GraphResult<()> {
        let members: Vec<FunctionId> = self
            .cycles
            .get(&cycle)
            .map(|c| c.functions.iter().copied().collect())
            .unwrap_or_default();

        // Whole-cycle total: member self costs plus everything leaving the cycle.
        let mut total = inevent.null();
        let mut exits = Vec::new();
        for &member in &members {
            let function = self.function(member)?;
            let mut subtotal = function.events.get(inevent)?;
            for call in function.calls.values() {
                if self.cycle_of(call.callee_id) != Some(cycle) {
                    let call_total =
                        call_ratio(call)? * self.unit_total(call.callee_id, outevent)?;
                    exits.push((member, call.callee_id, call_total));
                    subtotal += call_total;
                }
            }
            total += subtotal;
        }
        for (member, callee, call_total) in exits {
            if let Some(call) = self.function_mut(member)?.calls.get_mut(&callee) {
                call.events.insert(outevent, call_total);
            }
        }
        if let Some(c) = self.cycles.get_mut(&cycle) {
            c.events.insert(outevent, total);
        }

        // Incoming ratio per entry point.
        let mut entries: BTreeMap<FunctionId, f64> = BTreeMap::new();
        for function in self.functions.values() {
            if function.cycle == Some(cycle) {
                continue;
            }
            for call in function.calls.values() {
                if self.cycle_of(call.callee_id) == Some(cycle) {
                    *entries.entry(call.callee_id).or_insert(0.0) += call_ratio(call)?;
                }
            }
        }

        for &member in &members {
            self.function_mut(member)?.events.insert(outevent, outevent.null());
        }

        for (entry, entry_ratio) in entries {
            let ranks = self.cycle_ranks(cycle, entry)?;
            let call_ratios = self.cycle_call_ratios(cycle, entry, &ranks)?;
            let mut partials = HashMap::new();
            let partial = self.integrate_cycle_function(
                cycle,
                entry,
                entry_ratio,
                &mut partials,
                &ranks,
                &call_ratios,
                outevent,
                inevent,
            )?;

            let max_partial = partials.values().copied().fold(0.0, f64::max);
            if (partial - max_partial).abs() > PARTIAL_TOLERANCE * max_partial {
                return Err(GraphError::Consistency(format!(
                    "{cycle}: entry partial {partial} differs from largest member partial {max_partial}"
                )));
            }
            let expected = entry_ratio * total;
            if (expected - partial).abs() > CONSERVATION_TOLERANCE * expected {
                return Err(GraphError::Consistency(format!(
                    "{cycle}: distributed {partial} through entry {entry}, expected {expected}"
                )));
            }
        }
        Ok(())
    }

    /// Minimum number of intra-cycle hops from `entry` to every member of `cycle`.
    pub fn cycle_ranks(
        &self,
        cycle: CycleId,
        entry: FunctionId,
    ) -> GraphResult<HashMap<FunctionId, usize>> {
        let (graph, nodes) = call_graph(&self.functions, |f| f.cycle == Some(cycle));
        let start = nodes.get(&entry).copied().ok_or_else(|| {
            GraphError::InvalidArgument(format!("{entry} is not a member of {cycle}"))
        })?;
        Ok(dijkstra(&graph, start, None, |_| 1usize)
            .into_iter()
            .map(|(node, rank)| (graph[node], rank))
            .collect())
    }

    /// Sum and count of the rank-increasing call ratios received by each
    /// member reachable from `entry`.
    fn cycle_call_ratios(
        &self,
        cycle: CycleId,
        entry: FunctionId,
        ranks: &HashMap<FunctionId, usize>,
    ) -> GraphResult<HashMap<FunctionId, (f64, usize)>> {
        let mut call_ratios = HashMap::new();
        let mut visited = HashSet::new();
        let mut stack = vec![entry];
        while let Some(id) = stack.pop() {
            if !visited.insert(id) {
                continue;
            }
            let rank = ranks.get(&id).copied().unwrap_or_default();
            for call in self.function(id)?.outgoing() {
                if self.cycle_of(call.callee_id) != Some(cycle) {
                    continue;
                }
                if ranks.get(&call.callee_id).is_some_and(|r| *r > rank) {
                    let received = call_ratios.entry(call.callee_id).or_insert((0.0, 0));
                    received.0 += call_ratio(call)?;
                    received.1 += 1;
                    stack.push(call.callee_id);
                }
            }
        }
        Ok(call_ratios)
    }

    /// Spreads `partial_ratio` of the cycle total over the members reachable
    /// from `entry`, accumulating into member and intra-cycle call totals.
    ///
    /// Returns the partial attributed to `entry`.
    #[allow(clippy::too_many_arguments)]
    fn integrate_cycle_function(
        &mut self,
        cycle: CycleId,
        entry: FunctionId,
        partial_ratio: f64,
        partials: &mut HashMap<FunctionId, f64>,
        ranks: &HashMap<FunctionId, usize>,
        call_ratios: &HashMap<FunctionId, (f64, usize)>,
        outevent: Event,
        inevent: Event,
    ) -> GraphResult<f64> {
        let mut stack = vec![(entry, false)];
        while let Some((id, expanded)) = stack.pop() {
            if partials.contains_key(&id) {
                continue;
            }
            let rank = ranks.get(&id).copied().unwrap_or_default();
            let function = self.function(id)?;
            let higher: Vec<FunctionId> = function
                .outgoing()
                .filter(|call| {
                    self.cycle_of(call.callee_id) == Some(cycle)
                        && ranks.get(&call.callee_id).is_some_and(|r| *r > rank)
                })
                .map(|call| call.callee_id)
                .collect();

            if !expanded {
                stack.push((id, true));
                stack.extend(
                    higher
                        .into_iter()
                        .filter(|callee| !partials.contains_key(callee))
                        .map(|callee| (callee, false)),
                );
                continue;
            }

            let mut partial = partial_ratio * function.events.get(inevent)?;
            let mut call_partials = Vec::new();
            for call in function.outgoing() {
                if self.cycle_of(call.callee_id) != Some(cycle) {
                    partial += partial_ratio * call.events.get(outevent)?;
                } else if higher.contains(&call.callee_id) {
                    let callee_partial = partials.get(&call.callee_id).copied().ok_or_else(|| {
                        GraphError::Consistency(format!(
                            "{cycle}: member {} visited before its callee",
                            function.name
                        ))
                    })?;
                    let (received, callers) =
                        call_ratios.get(&call.callee_id).copied().unwrap_or((0.0, 1));
                    // A callee reached only through zero-ratio edges is split evenly among them.
                    let share = if received > 0.0 {
                        ratio(call_ratio(call)?, received)
                    } else {
                        1.0 / callers.max(1) as f64
                    };
                    let call_partial = share * callee_partial;
                    call_partials.push((call.callee_id, call_partial));
                    partial += call_partial;
                }
            }

            partials.insert(id, partial);
            let function = self.function_mut(id)?;
            function.events.increment(outevent, partial);
            for (callee, call_partial) in call_partials {
                if let Some(call) = function.calls.get_mut(&callee) {
                    call.events.increment(outevent, call_partial);
                }
            }
        }
        partials.get(&entry).copied().ok_or_else(|| {
            GraphError::Consistency(format!("{cycle}: entry {entry} was not integrated"))
        })
    }
}
