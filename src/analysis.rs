//! The fixed post-parse analysis pipeline.

use crate::{
    AnalysisConfig, GraphError, GraphResult, Profile, SAMPLES, SAMPLES2, TIME_RATIO,
    TOTAL_SAMPLES, TOTAL_TIME_RATIO, TotalMethod,
};

/// Runs validation, cycle detection, ratio computation and total-time
/// derivation on a freshly parsed profile.
pub fn analyze(profile: &mut Profile, config: &AnalysisConfig) -> GraphResult<()> {
    if profile.events.contains(TOTAL_TIME_RATIO) {
        return Err(GraphError::Consistency(
            "profile has already been analysed".to_string(),
        ));
    }
    profile.validate();
    profile.find_cycles()?;
    profile.ratio(TIME_RATIO, SAMPLES)?;
    profile.call_ratios(SAMPLES2)?;
    match config.total_method {
        TotalMethod::CallRatios => profile.integrate(TOTAL_TIME_RATIO, TIME_RATIO)?,
        TotalMethod::Callstacks => {
            profile.inclusive_samples()?;
            profile.ratio(TOTAL_TIME_RATIO, TOTAL_SAMPLES)?;
        }
    }
    tracing::debug!(
        functions = profile.functions.len(),
        calls = profile.call_count(),
        cycles = profile.cycles.len(),
        diagnostics = profile.diagnostics.len(),
        method = ?config.total_method,
        "analysis complete"
    );
    Ok(())
}

impl Profile {
    /// Derives `TOTAL_SAMPLES` from the inclusive cost recorded on call edges.
    ///
    /// A function's total is its own samples plus the inclusive cost of each
    /// outgoing non-self call; each call's total is its inclusive cost.
    pub fn inclusive_samples(&mut self) -> GraphResult<()> {
        for function in self.functions.values_mut() {
            let mut total = function.events.get(SAMPLES)?;
            for call in function.calls.values_mut() {
                let Ok(cost) = call.events.get(SAMPLES2) else {
                    continue;
                };
                call.events.insert(TOTAL_SAMPLES, cost);
                if call.callee_id != function.id {
                    total += cost;
                }
            }
            function.events.insert(TOTAL_SAMPLES, total);
        }
        let samples = self.events.get(SAMPLES)?;
        self.events.insert(TOTAL_SAMPLES, samples);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::tests::{build, id};

    fn total(profile: &Profile, name: &str) -> f64 {
        profile.functions[&id(name)]
            .events
            .get(TOTAL_TIME_RATIO)
            .expect("total")
    }

    #[test]
    fn call_ratio_method_integrates() {
        let mut profile = build(
            &[("main", 0.0), ("a", 2.0), ("b", 3.0), ("idle", 5.0)],
            &[("main", "a", 5.0), ("a", "b", 3.0), ("b", "a", 1.0)],
        );
        analyze(&mut profile, &AnalysisConfig::default()).expect("analyze");
        assert_eq!(profile.cycles.len(), 1);
        assert!((total(&profile, "main") - 0.5).abs() < 1e-9);
    }

    #[test]
    fn callstack_method_uses_inclusive_edge_cost() {
        let mut profile = build(
            &[("main", 1.0), ("a", 2.0), ("b", 3.0)],
            &[("main", "a", 5.0), ("a", "b", 3.0), ("a", "a", 7.0)],
        );
        let config = AnalysisConfig {
            total_method: TotalMethod::Callstacks,
            ..AnalysisConfig::default()
        };
        analyze(&mut profile, &config).expect("analyze");
        assert!((total(&profile, "main") - 1.0).abs() < 1e-12);
        assert!((total(&profile, "a") - 5.0 / 6.0).abs() < 1e-12);
        assert!((total(&profile, "b") - 0.5).abs() < 1e-12);
        let edge = profile.functions[&id("main")].calls[&id("a")]
            .events
            .get(TOTAL_TIME_RATIO)
            .expect("edge total");
        assert!((edge - 5.0 / 6.0).abs() < 1e-12);
    }

    #[test]
    fn analysing_twice_is_rejected() {
        let mut profile = build(&[("a", 1.0)], &[]);
        analyze(&mut profile, &AnalysisConfig::default()).expect("first");
        assert!(matches!(
            analyze(&mut profile, &AnalysisConfig::default()),
            Err(GraphError::Consistency(_))
        ));
    }

    #[test]
    fn validation_runs_first() {
        let mut profile = build(&[("a", 1.0), ("b", 1.0)], &[("a", "b", 1.0)]);
        profile
            .function_mut(id("a"))
            .expect("a")
            .call_mut(crate::FunctionId::from_name("ghost"));
        analyze(&mut profile, &AnalysisConfig::default()).expect("analyze");
        assert_eq!(profile.call_count(), 1);
        assert!((total(&profile, "a") - 1.0).abs() < 1e-12);
    }
}
