//! Scoring factors, curve selection and the configuration hash.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;
use xxhash_rust::xxh3::xxh3_64;

/// Inclusive bounds for a factor weight.
pub const WEIGHT_RANGE: std::ops::RangeInclusive<f64> = -100.0..=100.0;

/// Inclusive bounds for curve sensitivity.
pub const SENSITIVITY_RANGE: std::ops::RangeInclusive<f64> = 0.5..=3.0;

/// A weighted category of points of interest.
///
/// A positive weight rewards proximity, a negative weight penalises it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Factor {
    /// Stable identifier, also used as the default category.
    pub id: String,
    /// Signed weight in `[-100, 100]`.
    pub weight: f64,
    /// Distance in metres beyond which the factor contributes nothing.
    pub max_distance: f64,
    /// Disabled factors are ignored by scoring.
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    /// POI categories feeding this factor. Empty means `[id]`.
    #[serde(default)]
    pub categories: Vec<String>,
}

const fn enabled_by_default() -> bool {
    true
}

impl Factor {
    /// Enabled factor whose only category is its id.
    pub fn new(id: impl Into<String>, weight: f64, max_distance: f64) -> Self {
        Self {
            id: id.into(),
            weight,
            max_distance,
            enabled: true,
            categories: Vec::new(),
        }
    }

    /// Replace the category list.
    #[must_use]
    pub fn with_categories<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.categories = categories.into_iter().map(Into::into).collect();
        self
    }

    /// Set the enabled flag.
    #[must_use]
    pub const fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Whether the factor takes part in scoring.
    pub fn is_active(&self) -> bool {
        self.enabled && self.weight != 0.0
    }

    /// Whether a POI category feeds this factor.
    pub fn matches_category(&self, category: &str) -> bool {
        if self.categories.is_empty() {
            return self.id == category;
        }
        self.categories.iter().any(|c| c == category)
    }
}

/// Distance-decay curve family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceCurve {
    /// `1 - t`.
    #[default]
    Linear,
    /// Logarithmic: falls quickly near the POI, slowly further out.
    Log,
    /// Exponential decay normalised to hit zero at `t = 1`.
    Exp,
    /// `(1 - t)^k`.
    Power,
}

/// Everything that influences a tile's scores apart from the POIs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoringConfig {
    /// Factor list in caller order.
    pub factors: Vec<Factor>,
    /// Curve applied to every factor.
    #[serde(default)]
    pub distance_curve: DistanceCurve,
    /// Curve steepness in `[0.5, 3]`.
    #[serde(default = "default_sensitivity")]
    pub sensitivity: f64,
    /// Power-mean exponent; zero selects the geometric mean.
    #[serde(default = "default_lambda")]
    pub aggregation_lambda: f64,
}

const fn default_sensitivity() -> f64 {
    1.0
}

const fn default_lambda() -> f64 {
    1.0
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            factors: Vec::new(),
            distance_curve: DistanceCurve::default(),
            sensitivity: default_sensitivity(),
            aggregation_lambda: default_lambda(),
        }
    }
}

/// Validation failures for [`ScoringConfig`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScoringConfigError {
    /// A factor weight fell outside `[-100, 100]` or was not finite.
    #[error("factor `{id}` has weight {weight} outside [-100, 100]")]
    WeightOutOfRange {
        /// Factor identifier.
        id: String,
        /// Supplied weight.
        weight: f64,
    },
    /// A factor's maximum distance was not a positive finite number.
    #[error("factor `{id}` has non-positive maxDistance {max_distance}")]
    InvalidMaxDistance {
        /// Factor identifier.
        id: String,
        /// Supplied distance.
        max_distance: f64,
    },
    /// Two factors shared an identifier.
    #[error("factor id `{id}` appears more than once")]
    DuplicateFactor {
        /// Repeated identifier.
        id: String,
    },
    /// Sensitivity fell outside `[0.5, 3]`.
    #[error("sensitivity {value} outside [0.5, 3]")]
    SensitivityOutOfRange {
        /// Supplied sensitivity.
        value: f64,
    },
    /// The aggregation exponent was NaN or infinite.
    #[error("aggregation lambda must be finite")]
    NonFiniteLambda,
}

impl ScoringConfig {
    /// Configuration with the given factors and default curve parameters.
    pub fn new(factors: Vec<Factor>) -> Self {
        Self {
            factors,
            ..Self::default()
        }
    }

    /// Select the distance curve.
    #[must_use]
    pub const fn with_curve(mut self, curve: DistanceCurve) -> Self {
        self.distance_curve = curve;
        self
    }

    /// Set the curve sensitivity.
    #[must_use]
    pub const fn with_sensitivity(mut self, sensitivity: f64) -> Self {
        self.sensitivity = sensitivity;
        self
    }

    /// Set the aggregation exponent.
    #[must_use]
    pub const fn with_lambda(mut self, lambda: f64) -> Self {
        self.aggregation_lambda = lambda;
        self
    }

    /// Check factor and curve parameters.
    pub fn validate(&self) -> Result<(), ScoringConfigError> {
        let mut seen = std::collections::HashSet::new();
        for factor in &self.factors {
            if !factor.weight.is_finite() || !WEIGHT_RANGE.contains(&factor.weight) {
                return Err(ScoringConfigError::WeightOutOfRange {
                    id: factor.id.clone(),
                    weight: factor.weight,
                });
            }
            if !factor.max_distance.is_finite() || factor.max_distance <= 0.0 {
                return Err(ScoringConfigError::InvalidMaxDistance {
                    id: factor.id.clone(),
                    max_distance: factor.max_distance,
                });
            }
            if !seen.insert(factor.id.as_str()) {
                return Err(ScoringConfigError::DuplicateFactor {
                    id: factor.id.clone(),
                });
            }
        }
        if !SENSITIVITY_RANGE.contains(&self.sensitivity) {
            return Err(ScoringConfigError::SensitivityOutOfRange {
                value: self.sensitivity,
            });
        }
        if !self.aggregation_lambda.is_finite() {
            return Err(ScoringConfigError::NonFiniteLambda);
        }
        Ok(())
    }

    /// Factors that are enabled and carry a non-zero weight.
    pub fn active_factors(&self) -> impl Iterator<Item = &Factor> {
        self.factors.iter().filter(|f| f.is_active())
    }

    /// Largest `maxDistance` among active factors, or zero when none are.
    pub fn max_active_distance(&self) -> f64 {
        self.active_factors()
            .map(|f| f.max_distance)
            .fold(0.0, f64::max)
    }

    /// Deterministic hash of the configuration.
    ///
    /// Factor order and category order do not affect the hash.
    pub fn config_hash(&self) -> ConfigHash {
        let mut factors: Vec<Factor> = self.factors.clone();
        for factor in &mut factors {
            factor.categories.sort_unstable();
        }
        factors.sort_by(|a, b| a.id.cmp(&b.id));
        let canonical = Self {
            factors,
            ..self.clone()
        };
        // Serialising plain data into a `Vec` does not fail; fall back to the
        // debug form so the hash stays total.
        let bytes = serde_json::to_vec(&canonical)
            .unwrap_or_else(|_| format!("{canonical:?}").into_bytes());
        ConfigHash(xxh3_64(&bytes))
    }
}

/// Hash of a [`ScoringConfig`]. Equal hashes mean bit-identical scores for
/// the same tile and POI snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConfigHash(u64);

impl ConfigHash {
    /// Raw hash value.
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConfigHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl Serialize for ConfigHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ConfigHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        u64::from_str_radix(&text, 16)
            .map(Self)
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};

    #[fixture]
    fn config() -> ScoringConfig {
        ScoringConfig::new(vec![
            Factor::new("parks", 60.0, 800.0),
            Factor::new("noise", -40.0, 300.0).with_categories(["bar", "highway"]),
        ])
    }

    #[rstest]
    fn hash_ignores_factor_and_category_order(config: ScoringConfig) {
        let mut reordered = config.clone();
        reordered.factors.reverse();
        reordered.factors[0].categories.reverse();
        assert_eq!(config.config_hash(), reordered.config_hash());
    }

    #[rstest]
    #[case::weight(|c: &mut ScoringConfig| c.factors[0].weight = 61.0)]
    #[case::distance(|c: &mut ScoringConfig| c.factors[0].max_distance = 900.0)]
    #[case::enabled(|c: &mut ScoringConfig| c.factors[0].enabled = false)]
    #[case::categories(|c: &mut ScoringConfig| c.factors[1].categories.push("rail".into()))]
    #[case::curve(|c: &mut ScoringConfig| c.distance_curve = DistanceCurve::Exp)]
    #[case::sensitivity(|c: &mut ScoringConfig| c.sensitivity = 2.0)]
    #[case::lambda(|c: &mut ScoringConfig| c.aggregation_lambda = 0.0)]
    fn hash_changes_with_each_input(config: ScoringConfig, #[case] mutate: fn(&mut ScoringConfig)) {
        let mut changed = config.clone();
        mutate(&mut changed);
        assert_ne!(config.config_hash(), changed.config_hash());
    }

    #[rstest]
    fn hash_serialises_as_hex(config: ScoringConfig) {
        let hash = config.config_hash();
        let json = serde_json::to_string(&hash).expect("serialise");
        assert_eq!(json, format!("\"{hash}\""));
        let back: ConfigHash = serde_json::from_str(&json).expect("deserialise");
        assert_eq!(back, hash);
    }

    #[rstest]
    fn factor_defaults_to_own_category() {
        let factor = Factor::new("school", 10.0, 500.0);
        assert!(factor.matches_category("school"));
        assert!(!factor.matches_category("park"));
    }

    #[rstest]
    fn active_factors_skip_zero_and_disabled(mut config: ScoringConfig) {
        config.factors.push(Factor::new("zero", 0.0, 100.0));
        config
            .factors
            .push(Factor::new("off", 20.0, 2_000.0).with_enabled(false));
        let ids: Vec<_> = config.active_factors().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, ["parks", "noise"]);
        assert!((config.max_active_distance() - 800.0).abs() < f64::EPSILON);
    }

    #[rstest]
    #[case(Factor::new("a", 101.0, 10.0))]
    #[case(Factor::new("a", f64::NAN, 10.0))]
    #[case(Factor::new("a", 10.0, 0.0))]
    #[case(Factor::new("a", 10.0, -5.0))]
    fn validate_rejects_bad_factors(#[case] factor: Factor) {
        assert!(ScoringConfig::new(vec![factor]).validate().is_err());
    }

    #[rstest]
    #[case(0.4)]
    #[case(3.1)]
    fn validate_rejects_sensitivity(#[case] sensitivity: f64) {
        let config = ScoringConfig::default().with_sensitivity(sensitivity);
        assert_eq!(
            config.validate(),
            Err(ScoringConfigError::SensitivityOutOfRange { value: sensitivity })
        );
    }

    #[rstest]
    fn validate_rejects_duplicate_ids() {
        let config = ScoringConfig::new(vec![
            Factor::new("a", 1.0, 10.0),
            Factor::new("a", 2.0, 10.0),
        ]);
        assert!(matches!(
            config.validate(),
            Err(ScoringConfigError::DuplicateFactor { .. })
        ));
    }

    #[rstest]
    fn deserialises_wire_names() {
        let json = r#"{"factors":[{"id":"park","weight":80,"maxDistance":1000}],
            "distanceCurve":"linear","sensitivity":1,"aggregationLambda":1}"#;
        let config: ScoringConfig = serde_json::from_str(json).expect("deserialise");
        assert!(config.factors[0].enabled);
        assert_eq!(config.distance_curve, DistanceCurve::Linear);
    }
}
