use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::{FamilyTable, WeightTables};
use crate::enrichment::{GameState, IntensityLevel};
use crate::snapshot::Market;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WeightFactor {
    PreMatchPrior,
    CurrentRate,
    Momentum,
    Possession,
    CurrentScore,
    Physical,
    HomeAdvantage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketFamily {
    Goals,
    Corners,
    Fouls,
    Cards,
    Btts,
}

impl MarketFamily {
    pub const ALL: [MarketFamily; 5] = [
        MarketFamily::Goals,
        MarketFamily::Corners,
        MarketFamily::Fouls,
        MarketFamily::Cards,
        MarketFamily::Btts,
    ];

    /// Weight family a market borrows its blend from.
    pub fn of(market: Market) -> Self {
        match market {
            Market::Goals | Market::Shots | Market::ShotsOnTarget | Market::Offsides | Market::MatchResult => {
                MarketFamily::Goals
            }
            Market::Corners | Market::ThrowIns => MarketFamily::Corners,
            Market::Fouls => MarketFamily::Fouls,
            Market::Cards => MarketFamily::Cards,
            Market::Btts => MarketFamily::Btts,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WeightPhase {
    Early,
    FirstHalf,
    PreBreak,
    SecondHalfStart,
    SecondHalfMid,
    Late,
}

impl WeightPhase {
    fn from_bucket(idx: usize) -> Self {
        match idx {
            0 => WeightPhase::Early,
            1 => WeightPhase::FirstHalf,
            2 => WeightPhase::PreBreak,
            3 => WeightPhase::SecondHalfStart,
            4 => WeightPhase::SecondHalfMid,
            _ => WeightPhase::Late,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FactorWeights(pub BTreeMap<WeightFactor, f64>);

impl FactorWeights {
    pub fn get(&self, factor: WeightFactor) -> f64 {
        self.0.get(&factor).copied().unwrap_or(0.0)
    }

    pub fn sum(&self) -> f64 {
        self.0.values().sum()
    }

    fn bump(&mut self, factor: WeightFactor, delta: f64) {
        if let Some(w) = self.0.get_mut(&factor) {
            *w += delta;
        }
    }

    fn normalize(&mut self) {
        let sum = self.sum();
        if sum > 0.0 && sum.is_finite() {
            for w in self.0.values_mut() {
                *w /= sum;
            }
        }
    }

    /// Pin one factor to `target` and rescale the rest to fill the remainder.
    fn pin(&mut self, factor: WeightFactor, target: f64) {
        let others: f64 = self
            .0
            .iter()
            .filter(|(f, _)| **f != factor)
            .map(|(_, w)| *w)
            .sum();
        for (f, w) in self.0.iter_mut() {
            if *f == factor {
                *w = target;
            } else if others > 0.0 {
                *w = *w / others * (1.0 - target);
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DynamicWeights {
    pub families: BTreeMap<MarketFamily, FactorWeights>,
    pub phase: WeightPhase,
    pub confidence: f64,
}

impl DynamicWeights {
    pub fn family(&self, family: MarketFamily) -> Option<&FactorWeights> {
        self.families.get(&family)
    }

    pub fn for_market(&self, market: Market) -> Option<&FactorWeights> {
        self.family(MarketFamily::of(market))
    }
}

/// Blend weights per market family for the current phase of the match.
/// `home_advantage` is a 0-1 scalar that scales the home-advantage factor.
pub fn compute_weights(
    minute: u16,
    home_score: u8,
    away_score: u8,
    game_state: GameState,
    home_advantage: f64,
    intensity: IntensityLevel,
    tables: &WeightTables,
) -> DynamicWeights {
    let bucket = tables
        .phase_bounds
        .iter()
        .position(|bound| minute < *bound)
        .unwrap_or(tables.phase_bounds.len());
    let diff = home_score as i32 - away_score as i32;
    let both_scored = home_score > 0 && away_score > 0;
    let home_advantage = if home_advantage.is_finite() {
        home_advantage.clamp(0.0, 1.0)
    } else {
        0.0
    };

    let families = MarketFamily::ALL
        .into_iter()
        .map(|family| {
            let table = match family {
                MarketFamily::Goals => &tables.goals,
                MarketFamily::Corners => &tables.corners,
                MarketFamily::Fouls => &tables.fouls,
                MarketFamily::Cards => &tables.cards,
                MarketFamily::Btts => &tables.btts,
            };
            let mut weights = base_weights(table, bucket);

            if diff == 0 {
                weights.bump(WeightFactor::Momentum, tables.tied_momentum_boost);
            } else if diff.abs() >= tables.lopsided_diff {
                weights.bump(WeightFactor::CurrentScore, tables.lopsided_score_boost);
            }
            match intensity {
                IntensityLevel::High => weights.bump(WeightFactor::Physical, tables.high_intensity_physical),
                IntensityLevel::VeryHigh => {
                    weights.bump(WeightFactor::Physical, tables.very_high_intensity_physical)
                }
                _ => {}
            }
            match game_state {
                GameState::Open => weights.bump(WeightFactor::CurrentRate, tables.open_rate_boost),
                GameState::Defensive => weights.bump(WeightFactor::PreMatchPrior, tables.defensive_prior_boost),
                _ => {}
            }
            if let Some(w) = weights.0.get_mut(&WeightFactor::HomeAdvantage) {
                *w *= 1.0 + home_advantage;
            }
            weights.normalize();

            if family == MarketFamily::Btts && both_scored {
                weights.pin(WeightFactor::CurrentScore, tables.btts_decided_score_weight);
            }
            (family, weights)
        })
        .collect();

    let progress = (minute as f64 / 90.0).clamp(0.0, 1.0);
    let mut confidence = 50.0 + 35.0 * progress;
    confidence += match game_state {
        GameState::HomeDominating | GameState::AwayDominating => 8.0,
        GameState::Balanced => 5.0,
        GameState::Open | GameState::Defensive => 2.0,
    };
    confidence += match intensity {
        IntensityLevel::Medium | IntensityLevel::High => 5.0,
        IntensityLevel::Low => 2.0,
        IntensityLevel::VeryHigh => 0.0,
    };

    DynamicWeights {
        families,
        phase: WeightPhase::from_bucket(bucket),
        confidence: confidence.clamp(50.0, 100.0),
    }
}

fn base_weights(table: &FamilyTable, bucket: usize) -> FactorWeights {
    let row = table
        .phases
        .get(bucket)
        .or_else(|| table.phases.last())
        .cloned()
        .unwrap_or_default();
    FactorWeights(
        table
            .factors
            .iter()
            .zip(row)
            .map(|(f, w)| (*f, w.max(0.0)))
            .collect(),
    )
}
