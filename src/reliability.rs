//! Second-opinion scoring of a single prediction before publication.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::{HistoricalAverages, ReliabilityConfig};
use crate::enrichment::{finite_or, ratio};
use crate::projection::{MarketPrediction, OutcomePrediction, OutcomeSelection, OverUnderMarket};
use crate::snapshot::{HistoryPoint, Market};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VolatilityLevel {
    Low,
    Medium,
    High,
    Extreme,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReliabilityVerdict {
    pub market: Market,
    /// Line for over/under picks.
    pub threshold: Option<f64>,
    /// Selection for outcome picks.
    pub selection: Option<OutcomeSelection>,
    pub overall_score: f64,
    pub statistical_score: f64,
    pub cross_market_score: f64,
    pub historical_score: f64,
    pub volatility_score: f64,
    pub base_confidence_score: f64,
    pub volatility: VolatilityLevel,
    pub is_approved: bool,
    /// Reasons the prediction lost points.
    pub risk_factors: Vec<String>,
    /// Checks the prediction passed cleanly.
    pub safety_factors: Vec<String>,
}

#[derive(Default)]
struct Factors {
    risk: Vec<String>,
    safety: Vec<String>,
}

impl Factors {
    fn risk(&mut self, reason: String) {
        self.risk.push(reason);
    }

    fn safe(&mut self, reason: String) {
        self.safety.push(reason);
    }
}

/// Simultaneous full-match projections for every over/under market.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketBoard {
    projected: BTreeMap<Market, f64>,
}

impl MarketBoard {
    pub fn from_markets(markets: &[OverUnderMarket]) -> Self {
        Self {
            projected: markets.iter().map(|m| (m.market, m.projected)).collect(),
        }
    }

    pub fn insert(&mut self, market: Market, projected: f64) {
        self.projected.insert(market, projected);
    }

    pub fn get(&self, market: Market) -> Option<f64> {
        self.projected.get(&market).copied()
    }
}

struct CrossRule {
    name: &'static str,
    markets: &'static [Market],
    violated: fn(&MarketBoard) -> Option<bool>,
}

const CROSS_RULES: [CrossRule; 7] = [
    CrossRule {
        name: "high goals with few corners",
        markets: &[Market::Goals, Market::Corners],
        violated: |b| Some(b.get(Market::Goals)? > 3.0 && b.get(Market::Corners)? < 9.0),
    },
    CrossRule {
        name: "many shots with few goals",
        markets: &[Market::Shots, Market::Goals],
        violated: |b| Some(b.get(Market::Shots)? > 22.0 && b.get(Market::Goals)? < 1.5),
    },
    CrossRule {
        name: "shots on target exceed shots",
        markets: &[Market::ShotsOnTarget, Market::Shots],
        violated: |b| Some(b.get(Market::ShotsOnTarget)? > b.get(Market::Shots)?),
    },
    CrossRule {
        name: "goals exceed shots on target",
        markets: &[Market::Goals, Market::ShotsOnTarget],
        violated: |b| Some(b.get(Market::Goals)? > b.get(Market::ShotsOnTarget)?),
    },
    CrossRule {
        name: "cards out of proportion to fouls",
        markets: &[Market::Cards, Market::Fouls],
        violated: |b| Some(b.get(Market::Cards)? > 0.4 * b.get(Market::Fouls)?),
    },
    CrossRule {
        name: "many cards in a quiet match",
        markets: &[Market::Fouls, Market::Cards],
        violated: |b| Some(b.get(Market::Fouls)? < 15.0 && b.get(Market::Cards)? > 6.0),
    },
    CrossRule {
        name: "many corners with few shots",
        markets: &[Market::Corners, Market::Shots],
        violated: |b| Some(b.get(Market::Corners)? > 14.0 && b.get(Market::Shots)? < 15.0),
    },
];

/// Inputs shared by every verdict computed for one snapshot.
#[derive(Debug, Clone, Copy)]
pub struct ReliabilityContext<'a> {
    pub board: &'a MarketBoard,
    pub history: &'a [HistoryPoint],
    pub current_value: f64,
    pub minute: u16,
    pub config: &'a ReliabilityConfig,
    pub historical: &'a HistoricalAverages,
}

pub fn score(prediction: &MarketPrediction, ctx: &ReliabilityContext<'_>) -> ReliabilityVerdict {
    let market = prediction.market;
    let projected = finite_or(prediction.projected_value, 0.0);
    let mut factors = Factors::default();
    let cross_market_score = cross_market(market, ctx.board, ctx.config, &mut factors);

    let mut verdict = assess(market, market, projected, cross_market_score, prediction.confidence, ctx, factors);
    verdict.threshold = Some(prediction.threshold);
    verdict
}

/// Verdict for a BTTS or match-result pick. Those markets have no count of
/// their own, so the goals projection on the board is checked in their place
/// and `ctx.current_value` must hold the goals scored so far.
pub fn score_outcome(prediction: &OutcomePrediction, ctx: &ReliabilityContext<'_>) -> ReliabilityVerdict {
    let current = finite_or(ctx.current_value, 0.0);
    let projected = finite_or(ctx.board.get(Market::Goals).unwrap_or(current), current);
    let mut factors = Factors::default();

    let mut cross_market_score = cross_market(Market::Goals, ctx.board, ctx.config, &mut factors);
    match outcome_conflict(prediction.selection, projected, current) {
        Some(reason) => {
            cross_market_score = (cross_market_score - ctx.config.cross_rule_penalty).clamp(0.0, 100.0);
            factors.risk(reason);
        }
        None => factors.safe(format!("{:?} agrees with {projected:.1} projected goals", prediction.selection)),
    }

    let mut verdict = assess(
        prediction.market,
        Market::Goals,
        projected,
        cross_market_score,
        prediction.confidence,
        ctx,
        factors,
    );
    verdict.selection = Some(prediction.selection);
    verdict
}

fn outcome_conflict(selection: OutcomeSelection, projected: f64, current: f64) -> Option<String> {
    match selection {
        OutcomeSelection::BttsYes if projected < 2.0 => {
            Some(format!("BTTS yes needs two goals, {projected:.1} projected"))
        }
        OutcomeSelection::BttsNo if projected > 3.5 => {
            Some(format!("BTTS no against {projected:.1} projected goals"))
        }
        OutcomeSelection::Draw if projected - current > 2.5 => {
            Some(format!("draw with {:.1} goals still expected", projected - current))
        }
        _ => None,
    }
}

/// Run the per-market checks on `basis` and combine them with the cross-market
/// score already computed for `market`.
fn assess(
    market: Market,
    basis: Market,
    projected: f64,
    cross_market_score: f64,
    confidence: f64,
    ctx: &ReliabilityContext<'_>,
    mut factors: Factors,
) -> ReliabilityVerdict {
    let cfg = ctx.config;
    let statistical_score = statistical(basis, projected, ctx, &mut factors);
    let historical_score = historical_pattern(basis, projected, ctx, &mut factors);
    let (volatility, volatility_score) = volatility(basis, ctx.history, cfg);
    if volatility >= VolatilityLevel::High {
        factors.risk(format!("{basis} rate shows {volatility:?} volatility"));
    } else {
        factors.safe(format!("{basis} rate shows {volatility:?} volatility"));
    }
    let base_confidence_score = finite_or(confidence, 0.0).clamp(0.0, 100.0);

    let overall = cfg.statistical_weight * statistical_score
        + cfg.cross_market_weight * cross_market_score
        + cfg.historical_weight * historical_score
        + cfg.volatility_weight * volatility_score
        + cfg.base_confidence_weight * base_confidence_score;
    let overall_score = finite_or(overall, 0.0).clamp(0.0, 100.0);

    let subscores = [
        statistical_score,
        cross_market_score,
        historical_score,
        volatility_score,
    ];
    let is_approved = overall_score >= cfg.approval_score
        && subscores.iter().all(|s| *s >= cfg.min_subscore)
        && statistical_score >= cfg.min_statistical_score;

    ReliabilityVerdict {
        market,
        threshold: None,
        selection: None,
        overall_score,
        statistical_score,
        cross_market_score,
        historical_score,
        volatility_score,
        base_confidence_score,
        volatility,
        is_approved,
        risk_factors: factors.risk,
        safety_factors: factors.safety,
    }
}

fn statistical(market: Market, projected: f64, ctx: &ReliabilityContext<'_>, factors: &mut Factors) -> f64 {
    let cfg = ctx.config;
    let mut score: f64 = 100.0;

    if let Some(ceiling) = cfg.ceilings.get(&market) {
        if projected > ceiling.absolute {
            score -= cfg.absolute_ceiling_penalty;
            factors.risk(format!("{market} projection {projected:.1} above absolute ceiling {}", ceiling.absolute));
        } else if projected > ceiling.soft {
            score -= cfg.soft_ceiling_penalty;
            factors.risk(format!("{market} projection {projected:.1} above 99th percentile {}", ceiling.soft));
        } else {
            factors.safe(format!("{market} projection {projected:.1} within 99th percentile {}", ceiling.soft));
        }
    }

    let current = finite_or(ctx.current_value, 0.0);
    if projected + 1e-9 < current {
        score -= cfg.below_current_penalty;
        factors.risk(format!("{market} projection {projected:.1} below observed {current}"));
    }

    let minute = ctx.minute as f64;
    let remaining = 90.0 - minute;
    if ctx.minute >= cfg.pace_min_minute && remaining > 0.0 {
        let hist_rate = ctx.historical.per90(market) / 90.0;
        let observed_rate = ratio(current, minute, hist_rate);
        let implied_rate = (projected - current).max(0.0) / remaining;
        if implied_rate > cfg.pace_multiple * observed_rate.max(hist_rate) {
            score -= cfg.pace_penalty;
            factors.risk(format!("{market} needs {implied_rate:.3}/min for the rest of the match"));
        } else {
            factors.safe(format!("{market} implied pace {implied_rate:.3}/min is attainable"));
        }
    }

    score.clamp(0.0, 100.0)
}

fn cross_market(market: Market, board: &MarketBoard, cfg: &ReliabilityConfig, factors: &mut Factors) -> f64 {
    let mut score: f64 = 100.0;
    let mut checked = 0;
    for rule in CROSS_RULES.iter().filter(|r| r.markets.contains(&market)) {
        match (rule.violated)(board) {
            Some(true) => {
                score -= cfg.cross_rule_penalty;
                factors.risk(format!("cross-market: {}", rule.name));
            }
            Some(false) => checked += 1,
            None => {}
        }
    }
    if checked > 0 && score >= 100.0 {
        factors.safe(format!("{market} consistent with {checked} related markets"));
    }
    score.clamp(0.0, 100.0)
}

fn historical_pattern(
    market: Market,
    projected: f64,
    ctx: &ReliabilityContext<'_>,
    factors: &mut Factors,
) -> f64 {
    let cfg = ctx.config;
    if ctx.minute < cfg.progress_min_minute {
        return 100.0;
    }
    let mut score: f64 = 100.0;
    let current = finite_or(ctx.current_value, 0.0);

    let expected = expected_progress(&cfg.progress_curve, ctx.minute as f64);
    if projected > 0.0 && expected > 0.0 {
        let actual = (current / projected).clamp(0.0, 1.0);
        let deviation = (actual - expected).abs() / expected;
        if deviation > cfg.major_deviation {
            score -= cfg.major_deviation_penalty;
            factors.risk(format!(
                "{market} is {:.0}% through its total, typical is {:.0}%",
                actual * 100.0,
                expected * 100.0
            ));
        } else if deviation > cfg.minor_deviation {
            score -= cfg.minor_deviation_penalty;
            factors.risk(format!("{market} progress drifts {:.0}% from the usual curve", deviation * 100.0));
        } else {
            factors.safe(format!("{market} progress on curve at {}'", ctx.minute));
        }
    }

    if market == Market::Goals
        && ctx.minute >= 45
        && current == 0.0
        && projected > cfg.goalless_halftime_projection
    {
        score -= cfg.goalless_halftime_penalty;
        factors.risk(format!("goalless at {}' but {projected:.1} goals projected", ctx.minute));
    }

    score.clamp(0.0, 100.0)
}

/// Expected fraction of the final total reached by `minute`, linearly
/// interpolated between milestones.
pub fn expected_progress(curve: &[(f64, f64)], minute: f64) -> f64 {
    let Some(&(first_minute, first_value)) = curve.first() else {
        return (minute / 90.0).clamp(0.0, 1.0);
    };
    if minute <= first_minute {
        return first_value;
    }
    for pair in curve.windows(2) {
        let (m0, v0) = pair[0];
        let (m1, v1) = pair[1];
        if minute <= m1 {
            let t = ratio(minute - m0, m1 - m0, 1.0);
            return v0 + (v1 - v0) * t;
        }
    }
    curve.last().map(|(_, v)| *v).unwrap_or(1.0)
}

fn volatility(market: Market, history: &[HistoryPoint], cfg: &ReliabilityConfig) -> (VolatilityLevel, f64) {
    let rates: Vec<f64> = history
        .windows(2)
        .filter_map(|pair| {
            let dm = pair[1].minute as f64 - pair[0].minute as f64;
            if dm <= 0.0 {
                return None;
            }
            let dv = pair[1].snapshot.market_count(market) - pair[0].snapshot.market_count(market);
            Some(dv / dm)
        })
        .collect();

    if rates.len() < 2 {
        return (VolatilityLevel::Low, cfg.sparse_history_volatility_score);
    }

    let n = rates.len() as f64;
    let mean = rates.iter().sum::<f64>() / n;
    let variance = rates.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    let sd = finite_or(variance.sqrt(), 0.0);

    let [low, medium, high] = cfg
        .volatility_thresholds
        .get(&market)
        .copied()
        .unwrap_or([0.05, 0.12, 0.25]);
    let level = if sd <= low {
        VolatilityLevel::Low
    } else if sd <= medium {
        VolatilityLevel::Medium
    } else if sd <= high {
        VolatilityLevel::High
    } else {
        VolatilityLevel::Extreme
    };
    let penalty = cfg.volatility_penalties[level as usize];
    (level, (100.0 - penalty).clamp(0.0, 100.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projection::Direction;
    use crate::snapshot::{MatchSnapshot, SideStats, SnapshotHistory};

    fn prediction(market: Market, projected: f64, confidence: f64) -> MarketPrediction {
        MarketPrediction {
            market,
            threshold: 8.5,
            direction: Direction::Over,
            projected_value: projected,
            confidence,
            safety_margin: 1.0,
            reasoning: String::new(),
        }
    }

    fn board() -> MarketBoard {
        let mut b = MarketBoard::default();
        for (m, v) in [
            (Market::Goals, 2.6),
            (Market::Corners, 10.0),
            (Market::Shots, 24.0),
            (Market::ShotsOnTarget, 8.0),
            (Market::Fouls, 22.0),
            (Market::Cards, 4.0),
        ] {
            b.insert(m, v);
        }
        b
    }

    fn verdict(pred: &MarketPrediction, board: &MarketBoard, current: f64, minute: u16) -> ReliabilityVerdict {
        let cfg = ReliabilityConfig::default();
        let hist = HistoricalAverages::default();
        score(
            pred,
            &ReliabilityContext {
                board,
                history: &[],
                current_value: current,
                minute,
                config: &cfg,
                historical: &hist,
            },
        )
    }

    #[test]
    fn consistent_projection_scores_well() {
        let v = verdict(&prediction(Market::Corners, 10.0, 90.0), &board(), 5.0, 45);
        assert_eq!(v.statistical_score, 100.0);
        assert_eq!(v.cross_market_score, 100.0);
        assert_eq!(v.historical_score, 100.0);
        assert!(v.is_approved, "{v:?}");
        assert!(v.risk_factors.is_empty(), "{:?}", v.risk_factors);
        for expected in ["within 99th percentile", "consistent with", "progress on curve", "Low volatility"] {
            assert!(
                v.safety_factors.iter().any(|f| f.contains(expected)),
                "missing {expected}: {:?}",
                v.safety_factors
            );
        }
    }

    #[test]
    fn projection_below_observed_count_is_penalized() {
        let v = verdict(&prediction(Market::Corners, 6.0, 90.0), &board(), 8.0, 45);
        assert!(v.statistical_score <= 50.0);
        assert!(!v.is_approved);
    }

    #[test]
    fn ceilings_apply() {
        let soft = verdict(&prediction(Market::Goals, 6.5, 80.0), &board(), 3.0, 45);
        let hard = verdict(&prediction(Market::Goals, 9.0, 80.0), &board(), 3.0, 45);
        assert!(hard.statistical_score < soft.statistical_score);
        assert!(soft.statistical_score < 100.0);
        assert!(soft.risk_factors.iter().any(|f| f.contains("99th percentile")));
        assert!(!soft.safety_factors.iter().any(|f| f.contains("99th percentile")));
    }

    #[test]
    fn cross_rules_only_touch_involved_markets() {
        let mut b = board();
        b.insert(Market::Goals, 3.5);
        b.insert(Market::Corners, 7.0);
        let corners = verdict(&prediction(Market::Corners, 7.0, 80.0), &b, 3.0, 45);
        let fouls = verdict(&prediction(Market::Fouls, 22.0, 80.0), &b, 11.0, 45);
        assert_eq!(corners.cross_market_score, 85.0);
        assert_eq!(fouls.cross_market_score, 100.0);
    }

    #[test]
    fn goalless_halftime_with_high_projection_is_flagged() {
        let v = verdict(&prediction(Market::Goals, 2.8, 80.0), &board(), 0.0, 46);
        assert!(v.historical_score <= 75.0);
        assert!(v.risk_factors.iter().any(|i| i.contains("goalless")));
    }

    #[test]
    fn overall_is_bounded_for_extreme_inputs() {
        for (projected, confidence, current) in [
            (f64::NAN, f64::INFINITY, 0.0),
            (1e9, -50.0, 0.0),
            (0.0, 500.0, 40.0),
        ] {
            let v = verdict(&prediction(Market::Shots, projected, confidence), &board(), current, 60);
            assert!((0.0..=100.0).contains(&v.overall_score));
            if v.is_approved {
                assert!(v.overall_score >= 90.0);
            }
        }
    }

    #[test]
    fn erratic_history_raises_volatility() {
        let snaps = [(10, 0), (20, 6), (30, 6), (40, 14), (50, 14)].map(|(minute, corners)| MatchSnapshot {
            minute,
            home: SideStats {
                corners,
                ..SideStats::default()
            },
            ..MatchSnapshot::default()
        });
        let history = SnapshotHistory::from_snapshots(snaps).unwrap();
        let (level, score) = volatility(Market::Corners, history.points(), &ReliabilityConfig::default());
        assert!(level >= VolatilityLevel::High);
        assert!(score <= 75.0);
    }

    #[test]
    fn progress_curve_interpolates() {
        let cfg = ReliabilityConfig::default();
        assert!((expected_progress(&cfg.progress_curve, 45.0) - 0.49).abs() < 1e-12);
        let mid = expected_progress(&cfg.progress_curve, 52.5);
        assert!((mid - 0.575).abs() < 1e-9);
        assert_eq!(expected_progress(&cfg.progress_curve, 120.0), 1.0);
    }

    #[test]
    fn outcome_picks_are_checked_against_the_goals_projection() {
        let mut b = board();
        b.insert(Market::Goals, 1.2);
        let cfg = ReliabilityConfig::default();
        let hist = HistoricalAverages::default();
        let ctx = ReliabilityContext {
            board: &b,
            history: &[],
            current_value: 0.0,
            minute: 55,
            config: &cfg,
            historical: &hist,
        };
        let pick = |selection| OutcomePrediction {
            market: Market::Btts,
            selection,
            probability: 0.5,
            confidence: 60.0,
            safety_margin: 0.0,
            reasoning: String::new(),
        };

        let yes = score_outcome(&pick(OutcomeSelection::BttsYes), &ctx);
        let no = score_outcome(&pick(OutcomeSelection::BttsNo), &ctx);
        assert_eq!(yes.market, Market::Btts);
        assert_eq!(yes.selection, Some(OutcomeSelection::BttsYes));
        assert_eq!(yes.threshold, None);
        assert!(yes.risk_factors.iter().any(|f| f.contains("needs two goals")));
        assert!(no.safety_factors.iter().any(|f| f.contains("agrees with")));
        assert!((no.cross_market_score - yes.cross_market_score - cfg.cross_rule_penalty).abs() < 1e-9);
    }
}
