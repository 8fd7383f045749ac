//! Edge call ratios and per-function normalisation.

use std::collections::HashMap;

use crate::{
    CycleId, DiagnosticKind, Event, FunctionId, GraphError, GraphResult, Profile, ratio,
};

impl Profile {
    /// Sums `event` over all functions into the profile.
    ///
    /// Leaves the profile untouched when some function lacks the event.
    pub fn aggregate(&mut self, event: Event) -> GraphResult<()> {
        let mut total = event.null();
        for function in self.functions.values() {
            if !function.events.contains(event) {
                return Ok(());
            }
            total = event.aggregate(total, function.events.get(event)?)?;
        }
        self.events.insert(event, total);
        Ok(())
    }

    /// Sets `outevent` on every function and call to its `inevent` as a
    /// fraction of the profile-wide `inevent`.
    pub fn ratio(&mut self, outevent: Event, inevent: Event) -> GraphResult<()> {
        if self.events.contains(outevent) {
            return Err(GraphError::Consistency(format!(
                "profile already has {}",
                outevent.name()
            )));
        }
        let total = self.events.get(inevent)?;
        for function in self.functions.values_mut() {
            if function.events.contains(outevent) {
                return Err(GraphError::Consistency(format!(
                    "function {} already has {}",
                    function.name,
                    outevent.name()
                )));
            }
            let value = ratio(function.events.get(inevent)?, total);
            function.events.insert(outevent, value);
            for call in function.calls.values_mut() {
                if call.events.contains(inevent) {
                    let value = ratio(call.events.get(inevent)?, total);
                    call.events.insert(outevent, value);
                }
            }
        }
        self.events.insert(outevent, 1.0);
        Ok(())
    }

    /// Computes `Call::ratio` for every edge from its raw `event` cost.
    ///
    /// An edge's ratio is its cost over the callee's total incoming cost, or
    /// over the cycle's incoming cost when the edge enters a cycle from outside.
    /// Direct self-calls get `0.0` when they carry `event`, and no ratio otherwise.
    pub fn call_ratios(&mut self, event: Event) -> GraphResult<()> {
        let mut function_totals: HashMap<FunctionId, f64> =
            self.functions.keys().map(|id| (*id, 0.0)).collect();
        let mut cycle_totals: HashMap<CycleId, f64> =
            self.cycles.keys().map(|id| (*id, 0.0)).collect();
        let mut missing = Vec::new();

        for function in self.functions.values() {
            for call in function.outgoing() {
                let callee_cycle = self.cycle_of(call.callee_id);
                if !call.events.contains(event) {
                    missing.push((function.name.clone(), call.callee_id));
                    continue;
                }
                let cost = call.events.get(event)?;
                *function_totals.entry(call.callee_id).or_insert(0.0) += cost;
                if let Some(cycle) = callee_cycle
                    && callee_cycle != function.cycle
                {
                    *cycle_totals.entry(cycle).or_insert(0.0) += cost;
                }
            }
        }

        for (caller, callee) in missing {
            self.warn(
                DiagnosticKind::MissingCallCost,
                None,
                format!("no {} data for call from {caller} to {callee}", event.name()),
            );
        }

        let cycles: HashMap<FunctionId, CycleId> = self
            .functions
            .values()
            .filter_map(|f| f.cycle.map(|c| (f.id, c)))
            .collect();

        let mut bare_self_calls = Vec::new();
        for function in self.functions.values_mut() {
            let caller_id = function.id;
            let caller_cycle = function.cycle;
            for call in function.calls.values_mut() {
                if call.ratio.is_some() {
                    return Err(GraphError::Consistency(format!(
                        "call from {} to {} already has a ratio",
                        function.name, call.callee_id
                    )));
                }
                if call.callee_id == caller_id {
                    if call.events.contains(event) {
                        call.ratio = Some(0.0);
                    } else {
                        bare_self_calls.push(function.name.clone());
                    }
                    continue;
                }
                let Ok(cost) = call.events.get(event) else {
                    call.ratio = Some(0.0);
                    continue;
                };
                let callee_cycle = cycles.get(&call.callee_id).copied();
                let total = match callee_cycle {
                    Some(cycle) if callee_cycle != caller_cycle => {
                        cycle_totals.get(&cycle).copied().unwrap_or_default()
                    }
                    _ => function_totals
                        .get(&call.callee_id)
                        .copied()
                        .unwrap_or_default(),
                };
                call.ratio = Some(ratio(cost, total));
            }
        }
        for name in bare_self_calls {
            self.warn(
                DiagnosticKind::MissingCallCost,
                None,
                format!("no {} data for recursive call of {name}", event.name()),
            );
        }
        Ok(())
    }
}
