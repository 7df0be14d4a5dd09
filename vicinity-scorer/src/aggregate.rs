//! Sign-safe aggregation of factor contributions.
#![forbid(unsafe_code)]

/// One factor's input to aggregation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Contribution {
    /// Signed factor weight in `[-100, 100]`.
    pub weight: f64,
    /// Decay strength in `[0, 1]`; zero when no POI is in range.
    pub strength: f64,
}

/// Combine contributions into a score on the `[-100, 100]` scale.
///
/// Positive and negative factors form separate pools. Each pool takes the
/// `|w|`-weighted power mean of its magnitudes `s·|w|` with exponent `lambda`
/// (`lambda = 0` is the weighted geometric mean) and the result is
/// `K⁺ − K⁻`. Powers are only ever taken of non-negative magnitudes.
///
/// # Examples
///
/// ```
/// use vicinity_scorer::{Contribution, aggregate};
///
/// let parks = Contribution { weight: 80.0, strength: 1.0 };
/// let noise = Contribution { weight: -20.0, strength: 0.5 };
/// assert_eq!(aggregate(&[parks, noise], 1.0), 70.0);
/// ```
#[must_use]
#[expect(clippy::float_arithmetic, reason = "pools are combined by subtraction")]
pub fn aggregate(contributions: &[Contribution], lambda: f64) -> f64 {
    let positive = pool_mean(
        contributions.iter().filter(|c| c.weight > 0.0),
        lambda,
    );
    let negative = pool_mean(
        contributions.iter().filter(|c| c.weight < 0.0),
        lambda,
    );
    positive - negative
}

#[expect(
    clippy::float_arithmetic,
    reason = "weighted power means are floating-point formulas"
)]
fn pool_mean<'a, I>(pool: I, lambda: f64) -> f64
where
    I: Iterator<Item = &'a Contribution>,
{
    let mut total_weight = 0.0;
    let mut accumulated = 0.0;
    for contribution in pool {
        let weight = contribution.weight.abs();
        let magnitude = contribution.strength.clamp(0.0, 1.0) * weight;
        total_weight += weight;
        if magnitude == 0.0 {
            if lambda > 0.0 {
                continue;
            }
            // Means with a non-positive exponent collapse to zero.
            return 0.0;
        }
        accumulated += if lambda == 0.0 {
            weight * magnitude.ln()
        } else {
            weight * magnitude.powf(lambda)
        };
    }
    if total_weight == 0.0 {
        return 0.0;
    }
    let mean = accumulated / total_weight;
    if lambda == 0.0 {
        return mean.exp();
    }
    mean.powf(lambda.recip())
}
