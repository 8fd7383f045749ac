//! Ratio helper and the tolerances used by the analysis passes.

/// Slack allowed before an out-of-range ratio is reported (single-precision epsilon).
pub const RATIO_TOLERANCE: f64 = 1.0 / 8_388_608.0;

/// Relative slack between the entry partial and the largest member partial of a cycle.
pub const PARTIAL_TOLERANCE: f64 = 1e-7;

/// Relative slack on the total distributed through a cycle from one entry point.
pub const CONSERVATION_TOLERANCE: f64 = 1e-3;

/// `numerator / denominator` clamped to `[0, 1]`; `x / 0` is `1.0`.
pub fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        return 1.0;
    }
    let value = numerator / denominator;
    if value < 0.0 {
        if value < -RATIO_TOLERANCE {
            tracing::warn!(numerator, denominator, "negative ratio");
        }
        return 0.0;
    }
    if value > 1.0 {
        if value > 1.0 + RATIO_TOLERANCE {
            tracing::warn!(numerator, denominator, "ratio greater than one");
        }
        return 1.0;
    }
    value
}
