//! Final publication filter keyed by market risk tier.

use serde::{Deserialize, Serialize};

use crate::config::RiskTable;
use crate::snapshot::Market;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskTier {
    Safe,
    Moderate,
    Risky,
    VeryRisky,
}

impl RiskTier {
    /// Thresholds used when a risk table omits a tier.
    pub fn default_thresholds(self) -> TierThresholds {
        let (min_confidence, min_safety_score, max_baseline_deviation, min_safety_margin, base_confidence) =
            match self {
                RiskTier::Safe => (65.0, 60.0, 60.0, 0.5, 50.0),
                RiskTier::Moderate => (70.0, 65.0, 50.0, 0.7, 47.0),
                RiskTier::Risky => (78.0, 70.0, 40.0, 0.9, 43.0),
                RiskTier::VeryRisky => (85.0, 80.0, 30.0, 1.2, 40.0),
            };
        TierThresholds {
            min_confidence,
            min_safety_score,
            max_baseline_deviation,
            min_safety_margin,
            base_confidence,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TierThresholds {
    pub min_confidence: f64,
    pub min_safety_score: f64,
    /// Percent deviation of the projection from the historical per-90 average.
    pub max_baseline_deviation: f64,
    /// In Poisson standard units, see [`safety_margin`].
    pub min_safety_margin: f64,
    /// Starting confidence for projections in this tier.
    pub base_confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateDecision {
    pub approved: bool,
    pub reason: String,
    pub tier: RiskTier,
    pub thresholds: TierThresholds,
    pub failures: Vec<String>,
}

/// Distance of a projection from its line in Poisson standard units.
pub fn safety_margin(projected: f64, threshold: f64) -> f64 {
    let spread = projected.max(1.0).sqrt();
    let margin = (projected - threshold).abs() / spread;
    if margin.is_finite() { margin } else { 0.0 }
}

/// Margin for a probability priced market: 0 at a coin flip, 2 at certainty.
pub fn outcome_safety_margin(probability: f64) -> f64 {
    if !probability.is_finite() {
        return 0.0;
    }
    (probability.clamp(0.0, 1.0) - 0.5).abs() * 4.0
}

/// Percent deviation of a projected total from the historical average.
pub fn baseline_deviation(projected: f64, baseline: f64) -> f64 {
    if baseline <= 0.0 || !baseline.is_finite() || !projected.is_finite() {
        return 0.0;
    }
    (projected - baseline).abs() / baseline * 100.0
}

pub fn validate(
    market: Market,
    confidence: f64,
    safety_score: f64,
    baseline_deviation: f64,
    safety_margin: f64,
    table: &RiskTable,
) -> GateDecision {
    let tier = table.tier_of(market);
    let t = table.thresholds(market);
    let mut failures = Vec::new();

    if below(confidence, t.min_confidence) {
        failures.push(format!(
            "confidence {confidence:.1} below {:.1}",
            t.min_confidence
        ));
    }
    if below(safety_score, t.min_safety_score) {
        failures.push(format!(
            "safety score {safety_score:.1} below {:.1}",
            t.min_safety_score
        ));
    }
    if baseline_deviation.is_nan() || baseline_deviation > t.max_baseline_deviation {
        failures.push(format!(
            "baseline deviation {baseline_deviation:.1}% above {:.1}%",
            t.max_baseline_deviation
        ));
    }
    if below(safety_margin, t.min_safety_margin) {
        failures.push(format!(
            "safety margin {safety_margin:.2} below {:.2}",
            t.min_safety_margin
        ));
    }

    let approved = failures.is_empty();
    let reason = if approved {
        format!("{market} passes {tier:?} gate")
    } else {
        format!("{market} rejected ({tier:?}): {}", failures.join("; "))
    };

    GateDecision {
        approved,
        reason,
        tier,
        thresholds: t,
        failures,
    }
}

/// NaN never clears a minimum.
fn below(value: f64, min: f64) -> bool {
    value.is_nan() || value < min
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn safe_market_passes_with_modest_numbers() {
        let d = validate(Market::Corners, 70.0, 65.0, 20.0, 0.8, &RiskTable::default());
        assert!(d.approved, "{}", d.reason);
        assert_eq!(d.tier, RiskTier::Safe);
        assert!(d.failures.is_empty());
    }

    #[test]
    fn same_numbers_fail_for_match_result() {
        let d = validate(Market::MatchResult, 70.0, 65.0, 20.0, 0.8, &RiskTable::default());
        assert!(!d.approved);
        assert_eq!(d.tier, RiskTier::VeryRisky);
        assert_eq!(d.failures.len(), 3);
        assert!(d.reason.contains("confidence"));
    }

    #[test]
    fn every_failed_criterion_is_itemized() {
        let d = validate(Market::Goals, 10.0, 10.0, 99.0, 0.0, &RiskTable::default());
        assert_eq!(d.failures.len(), 4);
    }

    #[test]
    fn nan_confidence_is_rejected() {
        let d = validate(Market::Fouls, f64::NAN, 99.0, 0.0, 3.0, &RiskTable::default());
        assert!(!d.approved);
    }

    #[test]
    fn margins_are_finite_and_scaled() {
        assert!((safety_margin(9.0, 6.0) - 1.0).abs() < 1e-12);
        assert!((safety_margin(0.2, 0.5) - 0.3).abs() < 1e-12);
        assert_eq!(outcome_safety_margin(1.0), 2.0);
        assert_eq!(outcome_safety_margin(0.5), 0.0);
        assert_eq!(baseline_deviation(5.0, 0.0), 0.0);
        assert!((baseline_deviation(12.0, 10.0) - 20.0).abs() < 1e-9);
    }
}
