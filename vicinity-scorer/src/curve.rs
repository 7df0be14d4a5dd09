//! Distance-decay curves.
//!
//! Every curve maps a normalised distance `t ∈ [0, 1]` to a strength with
//! `s(0) = 1`, `s(1) = 0`, decreasing monotonically in between. Sensitivity
//! `k` controls steepness for the non-linear curves.
#![forbid(unsafe_code)]

use vicinity_core::DistanceCurve;

/// Evaluate `curve` at normalised distance `t` with steepness `sensitivity`.
///
/// `t` is clamped to `[0, 1]`; non-finite input yields zero.
///
/// # Examples
///
/// ```
/// use vicinity_core::DistanceCurve;
/// use vicinity_scorer::decay;
///
/// assert_eq!(decay(DistanceCurve::Linear, 0.25, 1.0), 0.75);
/// assert_eq!(decay(DistanceCurve::Exp, 1.0, 2.0), 0.0);
/// ```
#[must_use]
#[expect(
    clippy::float_arithmetic,
    reason = "decay curves are floating-point formulas"
)]
pub fn decay(curve: DistanceCurve, t: f64, sensitivity: f64) -> f64 {
    if !t.is_finite() {
        return 0.0;
    }
    if t >= 1.0 {
        return 0.0;
    }
    if t <= 0.0 {
        return 1.0;
    }
    let k = sensitivity;
    let strength = match curve {
        DistanceCurve::Linear => 1.0 - t,
        // 1 - ln(1 + t(e^k - 1)) / k
        DistanceCurve::Log => 1.0 - (t * k.exp_m1()).ln_1p() / k,
        // (e^{-kt} - e^{-k}) / (1 - e^{-k})
        DistanceCurve::Exp => ((-k * t).exp_m1() - (-k).exp_m1()) / -(-k).exp_m1(),
        DistanceCurve::Power => (1.0 - t).powf(k),
    };
    strength.clamp(0.0, 1.0)
}
