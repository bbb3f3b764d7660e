//! Versioned constant tables for every analysis stage.
//!
//! All magic numbers the pipeline relies on live here so a table can be
//! swapped (or loaded from a JSON override) and tested on its own.
//! `AnalysisConfig::default()` is the reference parameter set.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;
use crate::risk_gate::{RiskTier, TierThresholds};
use crate::snapshot::Market;
use crate::weights::WeightFactor;

pub const CONFIG_VERSION: u32 = 1;

pub static DEFAULT_CONFIG: Lazy<AnalysisConfig> = Lazy::new(AnalysisConfig::default);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub version: u32,
    pub validator: ValidatorConfig,
    pub anomaly: AnomalyConfig,
    pub historical: HistoricalAverages,
    pub enrichment: EnrichmentConfig,
    pub trend: TrendConfig,
    pub weights: WeightTables,
    pub projection: ProjectionConfig,
    pub reliability: ReliabilityConfig,
    pub risk: RiskTable,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            validator: ValidatorConfig::default(),
            anomaly: AnomalyConfig::default(),
            historical: HistoricalAverages::default(),
            enrichment: EnrichmentConfig::default(),
            trend: TrendConfig::default(),
            weights: WeightTables::default(),
            projection: ProjectionConfig::default(),
            reliability: ReliabilityConfig::default(),
            risk: RiskTable::default(),
        }
    }
}

/// Load a JSON override file. Sections (and fields inside them) that are
/// absent keep their default values.
pub fn load_config(path: &Path) -> Result<AnalysisConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("read analysis config {}", path.display()))?;
    parse_config(&raw)
}

pub fn parse_config(raw: &str) -> Result<AnalysisConfig> {
    let cfg: AnalysisConfig = serde_json::from_str(raw).context("parse analysis config")?;
    if cfg.version != CONFIG_VERSION {
        return Err(AnalysisError::ConfigVersion {
            expected: CONFIG_VERSION,
            found: cfg.version,
        }
        .into());
    }
    Ok(cfg)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    pub max_minute: u16,
    pub extra_time_minute: u16,
    /// Allowed excess of shots on target over total shots before it is a hard error.
    pub shots_tolerance: u32,
    pub cards_tolerance: u32,
    pub possession_hard: (f64, f64),
    pub possession_soft: (f64, f64),
    pub stale_zero_minute: u16,
    pub early_rate_minute: u16,
    pub max_early_corner_rate: f64,
    pub max_early_foul_rate: f64,
    pub max_early_shot_rate: f64,
    pub abandoned_red_cards: u32,
    /// Per-side ceiling for event counters; anything above is a feed fault.
    pub max_side_events: u32,
    pub max_side_passes: u32,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            max_minute: 120,
            extra_time_minute: 95,
            shots_tolerance: 1,
            cards_tolerance: 1,
            possession_hard: (90.0, 110.0),
            possession_soft: (95.0, 105.0),
            stale_zero_minute: 30,
            early_rate_minute: 30,
            max_early_corner_rate: 0.5,
            max_early_foul_rate: 1.0,
            max_early_shot_rate: 1.0,
            abandoned_red_cards: 5,
            max_side_events: 200,
            max_side_passes: 2000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnomalyConfig {
    pub min_minute: u16,
    pub multi_anomaly_factor: f64,

    pub red_card_possession_gap: f64,
    pub red_card_max_foul_gap: u32,
    pub red_card_minute: u16,
    pub red_card_adjustment: f64,
    pub yellow_flood_total: u32,
    pub yellow_flood_minute: u16,
    pub yellow_flood_adjustment: f64,

    pub defensive_sot_max: u32,
    pub defensive_sot_minute: u16,
    pub defensive_sot_adjustment: f64,
    pub defensive_corners_max: u32,
    pub defensive_corners_minute: u16,
    pub defensive_corners_adjustment: f64,
    pub goalless_minute: u16,
    pub goalless_adjustment: f64,

    pub goal_rate_per_ten: f64,
    pub goal_rate_minute: u16,
    pub goal_rate_adjustment: f64,
    pub offensive_sot_min: u32,
    pub offensive_sot_minute: u16,
    pub offensive_sot_adjustment: f64,
    pub goal_fest_total: u32,
    pub goal_fest_adjustment: f64,

    pub dominance_possession_gap: f64,
    pub dominance_possession_minute: u16,
    pub dominance_possession_adjustment: f64,
    pub dominance_shot_gap: u32,
    pub dominance_shot_minute: u16,
    pub dominance_shot_adjustment: f64,
    pub dominance_corner_gap: u32,
    pub dominance_corner_minute: u16,
    pub dominance_corner_adjustment: f64,

    pub ratio_minute: u16,
    pub wasteful_sot_min: u32,
    pub wasteful_adjustment: f64,
    pub clinical_shots_max: u32,
    pub clinical_goals_min: u32,
    pub clinical_adjustment: f64,
    pub lenient_fouls_min: u32,
    pub lenient_cards_max: u32,
    pub strict_fouls_max: u32,
    pub strict_cards_min: u32,
    pub discipline_adjustment: f64,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            min_minute: 5,
            multi_anomaly_factor: 0.7,

            red_card_possession_gap: 35.0,
            red_card_max_foul_gap: 5,
            red_card_minute: 30,
            red_card_adjustment: -20.0,
            yellow_flood_total: 8,
            yellow_flood_minute: 45,
            yellow_flood_adjustment: -15.0,

            defensive_sot_max: 5,
            defensive_sot_minute: 60,
            defensive_sot_adjustment: -10.0,
            defensive_corners_max: 4,
            defensive_corners_minute: 70,
            defensive_corners_adjustment: -8.0,
            goalless_minute: 75,
            goalless_adjustment: -5.0,

            goal_rate_per_ten: 1.0,
            goal_rate_minute: 45,
            goal_rate_adjustment: -10.0,
            offensive_sot_min: 15,
            offensive_sot_minute: 60,
            offensive_sot_adjustment: -5.0,
            goal_fest_total: 6,
            goal_fest_adjustment: -15.0,

            dominance_possession_gap: 40.0,
            dominance_possession_minute: 30,
            dominance_possession_adjustment: -8.0,
            dominance_shot_gap: 15,
            dominance_shot_minute: 45,
            dominance_shot_adjustment: -8.0,
            dominance_corner_gap: 8,
            dominance_corner_minute: 60,
            dominance_corner_adjustment: -5.0,

            ratio_minute: 60,
            wasteful_sot_min: 10,
            wasteful_adjustment: -10.0,
            clinical_shots_max: 10,
            clinical_goals_min: 4,
            clinical_adjustment: -8.0,
            lenient_fouls_min: 30,
            lenient_cards_max: 1,
            strict_fouls_max: 12,
            strict_cards_min: 6,
            discipline_adjustment: -5.0,
        }
    }
}

/// Reference per-90-minute averages. Combined values cover both sides,
/// per-side values cover one team.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoricalAverages {
    pub goals: f64,
    pub corners: f64,
    pub fouls: f64,
    pub cards: f64,
    pub shots: f64,
    pub shots_on_target: f64,
    pub throw_ins: f64,
    pub offsides: f64,

    pub side_expected_goals: f64,
    pub side_passes: f64,
    pub side_dangerous_attacks: f64,
    pub side_attacks: f64,
    pub side_defensive_actions: f64,
    pub side_duels: f64,
    pub side_touches_in_box: f64,
}

impl Default for HistoricalAverages {
    fn default() -> Self {
        Self {
            goals: 2.7,
            corners: 10.0,
            fouls: 23.0,
            cards: 4.2,
            shots: 24.5,
            shots_on_target: 8.5,
            throw_ins: 42.0,
            offsides: 4.0,

            side_expected_goals: 1.35,
            side_passes: 450.0,
            side_dangerous_attacks: 50.0,
            side_attacks: 100.0,
            side_defensive_actions: 45.0,
            side_duels: 50.0,
            side_touches_in_box: 25.0,
        }
    }
}

impl HistoricalAverages {
    /// Combined per-90 average for an over/under market.
    pub fn per90(&self, market: Market) -> f64 {
        match market {
            Market::Goals | Market::Btts | Market::MatchResult => self.goals,
            Market::Corners => self.corners,
            Market::Fouls => self.fouls,
            Market::Cards => self.cards,
            Market::Shots => self.shots,
            Market::ShotsOnTarget => self.shots_on_target,
            Market::ThrowIns => self.throw_ins,
            Market::Offsides => self.offsides,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentConfig {
    // Ratio fallbacks used when a denominator is zero.
    pub shot_accuracy: f64,
    pub conversion_rate: f64,
    pub big_chance_conversion: f64,
    pub pass_accuracy: f64,
    pub long_ball_accuracy: f64,
    pub cross_accuracy: f64,
    pub dribble_success: f64,
    pub xg_per_shot: f64,
    pub save_rate: f64,
    pub box_shot_share: f64,

    pub dominance_weights: DominanceWeights,

    pub thin_sample_minute: u16,
    /// Fraction of the historical rate below which an early observed rate is
    /// treated as noise and blended with the historical average.
    pub min_signal_floor: f64,

    pub momentum_dominance_weight: f64,
    pub momentum_goal_step: f64,
    pub dominating_threshold: f64,
    pub open_danger: f64,
    pub defensive_danger: f64,
    pub intensity_cutoffs: [f64; 3],

    pub corner_possession_gap: f64,
    pub corner_possession_boost: f64,
    pub corner_late_minute: u16,
    pub corner_late_boost: f64,
    pub corner_score_boost: f64,
    pub goals_open_boost: f64,
    pub goals_defensive_damp: f64,
    pub goals_chasing_minute: u16,
    pub goals_chasing_boost: f64,
    pub fouls_high_boost: f64,
    pub fouls_very_high_boost: f64,
    pub fouls_close_late_boost: f64,
    pub cards_late_minute: u16,
    pub cards_late_boost: f64,
    pub cards_close_boost: f64,
    pub shots_chasing_boost: f64,
    pub offsides_dominance_boost: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DominanceWeights {
    pub possession: f64,
    pub shots: f64,
    pub shots_on_target: f64,
    pub corners: f64,
    pub dangerous_attacks: f64,
    pub aerial_duels: f64,
}

impl Default for DominanceWeights {
    fn default() -> Self {
        Self {
            possession: 0.30,
            shots: 0.25,
            shots_on_target: 0.15,
            corners: 0.15,
            dangerous_attacks: 0.10,
            aerial_duels: 0.05,
        }
    }
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            shot_accuracy: 0.33,
            conversion_rate: 0.10,
            big_chance_conversion: 0.38,
            pass_accuracy: 0.80,
            long_ball_accuracy: 0.50,
            cross_accuracy: 0.25,
            dribble_success: 0.50,
            xg_per_shot: 0.10,
            save_rate: 0.70,
            box_shot_share: 0.60,

            dominance_weights: DominanceWeights::default(),

            thin_sample_minute: 15,
            min_signal_floor: 0.5,

            momentum_dominance_weight: 0.6,
            momentum_goal_step: 15.0,
            dominating_threshold: 30.0,
            open_danger: 55.0,
            defensive_danger: 25.0,
            intensity_cutoffs: [35.0, 55.0, 75.0],

            corner_possession_gap: 20.0,
            corner_possession_boost: 1.05,
            corner_late_minute: 75,
            corner_late_boost: 1.08,
            corner_score_boost: 1.05,
            goals_open_boost: 1.10,
            goals_defensive_damp: 0.90,
            goals_chasing_minute: 70,
            goals_chasing_boost: 1.10,
            fouls_high_boost: 1.08,
            fouls_very_high_boost: 1.15,
            fouls_close_late_boost: 1.05,
            cards_late_minute: 70,
            cards_late_boost: 1.15,
            cards_close_boost: 1.05,
            shots_chasing_boost: 1.05,
            offsides_dominance_boost: 1.05,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrendConfig {
    pub single_point_confidence: f64,
    pub trend_cutoff: f64,
    pub max_trend_adjustment: f64,
    pub snapshot_cap: usize,
    pub minute_cap: f64,
    pub count_weight: f64,
    pub fit_weight: f64,
    pub time_weight: f64,
}

impl Default for TrendConfig {
    fn default() -> Self {
        Self {
            single_point_confidence: 50.0,
            trend_cutoff: 0.15,
            max_trend_adjustment: 0.30,
            snapshot_cap: 5,
            minute_cap: 45.0,
            count_weight: 0.30,
            fit_weight: 0.40,
            time_weight: 0.30,
        }
    }
}

/// Per-family base weights for each of the six minute buckets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FamilyTable {
    pub factors: Vec<WeightFactor>,
    pub phases: Vec<Vec<f64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeightTables {
    /// Upper bounds (exclusive) of the first five minute buckets.
    pub phase_bounds: [u16; 5],
    pub goals: FamilyTable,
    pub corners: FamilyTable,
    pub fouls: FamilyTable,
    pub cards: FamilyTable,
    pub btts: FamilyTable,

    pub tied_momentum_boost: f64,
    pub lopsided_diff: i32,
    pub lopsided_score_boost: f64,
    pub high_intensity_physical: f64,
    pub very_high_intensity_physical: f64,
    pub open_rate_boost: f64,
    pub defensive_prior_boost: f64,
    pub btts_decided_score_weight: f64,
}

impl Default for WeightTables {
    fn default() -> Self {
        use WeightFactor::*;
        Self {
            phase_bounds: [15, 30, 45, 60, 75],
            goals: FamilyTable {
                factors: vec![PreMatchPrior, CurrentRate, Momentum, Possession, CurrentScore, HomeAdvantage],
                phases: vec![
                    vec![0.45, 0.15, 0.10, 0.10, 0.10, 0.10],
                    vec![0.35, 0.22, 0.13, 0.10, 0.12, 0.08],
                    vec![0.28, 0.28, 0.15, 0.10, 0.13, 0.06],
                    vec![0.22, 0.32, 0.16, 0.10, 0.15, 0.05],
                    vec![0.15, 0.36, 0.18, 0.08, 0.19, 0.04],
                    vec![0.10, 0.38, 0.20, 0.06, 0.23, 0.03],
                ],
            },
            corners: FamilyTable {
                factors: vec![PreMatchPrior, CurrentRate, Momentum, Possession, CurrentScore, HomeAdvantage],
                phases: vec![
                    vec![0.50, 0.20, 0.08, 0.12, 0.05, 0.05],
                    vec![0.38, 0.30, 0.10, 0.12, 0.06, 0.04],
                    vec![0.30, 0.37, 0.11, 0.12, 0.07, 0.03],
                    vec![0.23, 0.42, 0.12, 0.11, 0.09, 0.03],
                    vec![0.16, 0.46, 0.14, 0.10, 0.12, 0.02],
                    vec![0.10, 0.48, 0.16, 0.08, 0.16, 0.02],
                ],
            },
            fouls: FamilyTable {
                factors: vec![PreMatchPrior, CurrentRate, Physical, Momentum, CurrentScore, HomeAdvantage],
                phases: vec![
                    vec![0.50, 0.20, 0.12, 0.06, 0.06, 0.06],
                    vec![0.40, 0.28, 0.14, 0.06, 0.07, 0.05],
                    vec![0.32, 0.34, 0.15, 0.06, 0.09, 0.04],
                    vec![0.25, 0.38, 0.16, 0.07, 0.11, 0.03],
                    vec![0.18, 0.42, 0.17, 0.07, 0.14, 0.02],
                    vec![0.12, 0.44, 0.18, 0.07, 0.17, 0.02],
                ],
            },
            cards: FamilyTable {
                factors: vec![PreMatchPrior, CurrentRate, Physical, CurrentScore, Momentum, HomeAdvantage],
                phases: vec![
                    vec![0.55, 0.12, 0.15, 0.06, 0.06, 0.06],
                    vec![0.45, 0.18, 0.18, 0.08, 0.06, 0.05],
                    vec![0.36, 0.24, 0.20, 0.10, 0.06, 0.04],
                    vec![0.28, 0.28, 0.21, 0.13, 0.07, 0.03],
                    vec![0.20, 0.32, 0.22, 0.16, 0.08, 0.02],
                    vec![0.14, 0.34, 0.22, 0.20, 0.08, 0.02],
                ],
            },
            btts: FamilyTable {
                factors: vec![PreMatchPrior, CurrentRate, Momentum, CurrentScore, HomeAdvantage, Possession],
                phases: vec![
                    vec![0.50, 0.15, 0.10, 0.10, 0.08, 0.07],
                    vec![0.40, 0.20, 0.12, 0.16, 0.06, 0.06],
                    vec![0.32, 0.24, 0.13, 0.22, 0.05, 0.04],
                    vec![0.24, 0.26, 0.14, 0.29, 0.04, 0.03],
                    vec![0.16, 0.27, 0.15, 0.37, 0.03, 0.02],
                    vec![0.10, 0.26, 0.14, 0.46, 0.02, 0.02],
                ],
            },

            tied_momentum_boost: 0.05,
            lopsided_diff: 2,
            lopsided_score_boost: 0.08,
            high_intensity_physical: 0.05,
            very_high_intensity_physical: 0.10,
            open_rate_boost: 0.03,
            defensive_prior_boost: 0.03,
            btts_decided_score_weight: 0.60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectionConfig {
    pub thresholds: BTreeMap<Market, Vec<f64>>,
    pub trend_min_confidence: f64,
    pub trend_blend: (f64, f64, f64),
    pub early_minute: u16,
    pub margin_progress_shrink: f64,
    pub distance_bonus_per_unit: f64,
    pub max_distance_bonus: f64,
    pub time_bonus: f64,
    pub alignment_bonus: f64,
    pub misalignment_penalty: f64,
    pub max_confidence: f64,
    pub max_goals_per_side: u32,
    pub min_remaining_lambda: f64,
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        let thresholds = BTreeMap::from([
            (Market::Goals, vec![0.5, 1.5, 2.5, 3.5, 4.5, 5.5]),
            (Market::Corners, vec![6.5, 7.5, 8.5, 9.5, 10.5, 11.5, 12.5]),
            (Market::Fouls, vec![18.5, 20.5, 22.5, 24.5, 26.5, 28.5]),
            (Market::Cards, vec![2.5, 3.5, 4.5, 5.5, 6.5]),
            (Market::Shots, vec![18.5, 20.5, 22.5, 24.5, 26.5, 28.5]),
            (Market::ShotsOnTarget, vec![5.5, 6.5, 7.5, 8.5, 9.5, 10.5]),
            (Market::ThrowIns, vec![34.5, 38.5, 42.5, 46.5]),
            (Market::Offsides, vec![2.5, 3.5, 4.5, 5.5]),
        ]);
        Self {
            thresholds,
            trend_min_confidence: 60.0,
            trend_blend: (0.5, 0.3, 0.2),
            early_minute: 15,
            margin_progress_shrink: 0.5,
            distance_bonus_per_unit: 15.0,
            max_distance_bonus: 25.0,
            time_bonus: 20.0,
            alignment_bonus: 8.0,
            misalignment_penalty: 5.0,
            max_confidence: 95.0,
            max_goals_per_side: 10,
            min_remaining_lambda: 0.02,
        }
    }
}

/// Absolute and 99th-percentile ceilings for a full-match total.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ceiling {
    pub absolute: f64,
    pub soft: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReliabilityConfig {
    pub statistical_weight: f64,
    pub cross_market_weight: f64,
    pub historical_weight: f64,
    pub volatility_weight: f64,
    pub base_confidence_weight: f64,

    pub approval_score: f64,
    pub min_subscore: f64,
    pub min_statistical_score: f64,

    pub cross_rule_penalty: f64,

    pub ceilings: BTreeMap<Market, Ceiling>,
    pub absolute_ceiling_penalty: f64,
    pub soft_ceiling_penalty: f64,
    pub pace_multiple: f64,
    pub pace_min_minute: u16,
    pub pace_penalty: f64,
    pub below_current_penalty: f64,

    /// `(minute, expected fraction of the final total reached)` milestones.
    pub progress_curve: Vec<(f64, f64)>,
    pub progress_min_minute: u16,
    pub minor_deviation: f64,
    pub major_deviation: f64,
    pub minor_deviation_penalty: f64,
    pub major_deviation_penalty: f64,
    pub goalless_halftime_projection: f64,
    pub goalless_halftime_penalty: f64,

    /// LOW/MEDIUM/HIGH upper bounds of the rate standard deviation.
    pub volatility_thresholds: BTreeMap<Market, [f64; 3]>,
    pub volatility_penalties: [f64; 4],
    pub sparse_history_volatility_score: f64,
}

impl Default for ReliabilityConfig {
    fn default() -> Self {
        let ceiling = |absolute, soft| Ceiling { absolute, soft };
        Self {
            statistical_weight: 0.30,
            cross_market_weight: 0.20,
            historical_weight: 0.20,
            volatility_weight: 0.15,
            base_confidence_weight: 0.15,

            approval_score: 90.0,
            min_subscore: 60.0,
            min_statistical_score: 85.0,

            cross_rule_penalty: 15.0,

            ceilings: BTreeMap::from([
                (Market::Goals, ceiling(8.0, 6.0)),
                (Market::Corners, ceiling(24.0, 17.0)),
                (Market::Fouls, ceiling(45.0, 34.0)),
                (Market::Cards, ceiling(14.0, 9.0)),
                (Market::Shots, ceiling(50.0, 38.0)),
                (Market::ShotsOnTarget, ceiling(22.0, 15.0)),
                (Market::ThrowIns, ceiling(75.0, 60.0)),
                (Market::Offsides, ceiling(15.0, 9.0)),
            ]),
            absolute_ceiling_penalty: 40.0,
            soft_ceiling_penalty: 20.0,
            pace_multiple: 1.5,
            pace_min_minute: 10,
            pace_penalty: 15.0,
            below_current_penalty: 50.0,

            progress_curve: vec![
                (0.0, 0.0),
                (15.0, 0.15),
                (30.0, 0.32),
                (45.0, 0.49),
                (60.0, 0.66),
                (75.0, 0.83),
                (85.0, 0.94),
                (90.0, 1.0),
            ],
            progress_min_minute: 15,
            minor_deviation: 0.20,
            major_deviation: 0.35,
            minor_deviation_penalty: 15.0,
            major_deviation_penalty: 30.0,
            goalless_halftime_projection: 2.5,
            goalless_halftime_penalty: 25.0,

            volatility_thresholds: BTreeMap::from([
                (Market::Goals, [0.02, 0.05, 0.10]),
                (Market::Corners, [0.05, 0.12, 0.25]),
                (Market::Fouls, [0.10, 0.20, 0.40]),
                (Market::Cards, [0.03, 0.07, 0.15]),
                (Market::Shots, [0.10, 0.22, 0.45]),
                (Market::ShotsOnTarget, [0.05, 0.10, 0.20]),
                (Market::ThrowIns, [0.15, 0.30, 0.60]),
                (Market::Offsides, [0.03, 0.07, 0.15]),
            ]),
            volatility_penalties: [0.0, 10.0, 25.0, 45.0],
            sparse_history_volatility_score: 80.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskTable {
    pub tiers: BTreeMap<RiskTier, TierThresholds>,
    pub assignments: BTreeMap<Market, RiskTier>,
}

impl Default for RiskTable {
    fn default() -> Self {
        let tier = |min_confidence, min_safety_score, max_baseline_deviation, min_safety_margin, base_confidence| {
            TierThresholds {
                min_confidence,
                min_safety_score,
                max_baseline_deviation,
                min_safety_margin,
                base_confidence,
            }
        };
        Self {
            tiers: BTreeMap::from([
                (RiskTier::Safe, tier(65.0, 60.0, 60.0, 0.5, 50.0)),
                (RiskTier::Moderate, tier(70.0, 65.0, 50.0, 0.7, 47.0)),
                (RiskTier::Risky, tier(78.0, 70.0, 40.0, 0.9, 43.0)),
                (RiskTier::VeryRisky, tier(85.0, 80.0, 30.0, 1.2, 40.0)),
            ]),
            assignments: BTreeMap::from([
                (Market::Corners, RiskTier::Safe),
                (Market::Fouls, RiskTier::Safe),
                (Market::ThrowIns, RiskTier::Safe),
                (Market::Cards, RiskTier::Moderate),
                (Market::Shots, RiskTier::Moderate),
                (Market::ShotsOnTarget, RiskTier::Moderate),
                (Market::Offsides, RiskTier::Moderate),
                (Market::Goals, RiskTier::Risky),
                (Market::Btts, RiskTier::Risky),
                (Market::MatchResult, RiskTier::VeryRisky),
            ]),
        }
    }
}

impl RiskTable {
    pub fn tier_of(&self, market: Market) -> RiskTier {
        self.assignments
            .get(&market)
            .copied()
            .unwrap_or(RiskTier::VeryRisky)
    }

    pub fn thresholds(&self, market: Market) -> TierThresholds {
        let tier = self.tier_of(market);
        self.tiers
            .get(&tier)
            .copied()
            .unwrap_or_else(|| tier.default_thresholds())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weight_rows_sum_to_one() {
        let w = WeightTables::default();
        for table in [&w.goals, &w.corners, &w.fouls, &w.cards, &w.btts] {
            assert_eq!(table.phases.len(), 6);
            for row in &table.phases {
                assert_eq!(row.len(), table.factors.len());
                let sum: f64 = row.iter().sum();
                assert!((sum - 1.0).abs() < 1e-9, "row sums to {sum}");
            }
        }
    }

    #[test]
    fn partial_override_keeps_other_defaults() {
        let raw = r#"{"version":1,"trend":{"trend_cutoff":0.2}}"#;
        let cfg = parse_config(raw).expect("override should parse");
        assert_eq!(cfg.trend.trend_cutoff, 0.2);
        assert_eq!(cfg.trend.snapshot_cap, 5);
        assert_eq!(cfg.validator, ValidatorConfig::default());
    }

    #[test]
    fn rejects_unknown_version() {
        let err = parse_config(r#"{"version":7}"#).unwrap_err();
        assert!(err.to_string().contains("version 7"));
    }

    #[test]
    fn default_config_round_trips_through_json() {
        let json = serde_json::to_string(&*DEFAULT_CONFIG).expect("serialize config");
        let back = parse_config(&json).expect("config should parse back");
        assert_eq!(back.projection.thresholds, DEFAULT_CONFIG.projection.thresholds);
        assert_eq!(back.risk.assignments, DEFAULT_CONFIG.risk.assignments);
        assert_eq!(back.weights.phase_bounds, DEFAULT_CONFIG.weights.phase_bounds);
    }
}
