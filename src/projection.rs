//! Over/under line projections and Poisson-priced outcome markets.

use serde::{Deserialize, Serialize};

use crate::config::{HistoricalAverages, ProjectionConfig, RiskTable};
use crate::enrichment::{EnrichedMetrics, finite_or, per_minute};
use crate::risk_gate::{outcome_safety_margin, safety_margin};
use crate::snapshot::Market;
use crate::trend::{TrackedStat, TrendReport, TrendResult};
use crate::weights::{DynamicWeights, MarketFamily, WeightFactor};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    Over,
    Under,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectionMethod {
    /// Regression with trend correction, blended with enrichment and live rate.
    TrendBlend,
    /// Enrichment projection blended with the live rate by the current-rate weight.
    EnrichedBlend,
    /// Historical per-90 rate blended with the live rate by elapsed time.
    HistoricalBlend,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketPrediction {
    pub market: Market,
    pub threshold: f64,
    pub direction: Direction,
    pub projected_value: f64,
    pub confidence: f64,
    pub safety_margin: f64,
    pub reasoning: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverUnderMarket {
    pub market: Market,
    pub current_value: f64,
    pub projected: f64,
    pub method: ProjectionMethod,
    pub predictions: Vec<MarketPrediction>,
    pub best_pick: Option<MarketPrediction>,
}

/// Everything a projection reads besides the market's own count.
#[derive(Debug, Clone, Copy)]
pub struct ProjectionContext<'a> {
    pub enriched: &'a EnrichedMetrics,
    pub trends: &'a TrendReport,
    pub weights: &'a DynamicWeights,
    pub history_len: usize,
    pub minute: u16,
    pub config: &'a ProjectionConfig,
    pub historical: &'a HistoricalAverages,
    pub risk: &'a RiskTable,
}

pub fn project(market: Market, current_value: f64, ctx: &ProjectionContext<'_>) -> OverUnderMarket {
    let cfg = ctx.config;
    let current = finite_or(current_value, 0.0).max(0.0);
    let minute = ctx.minute as f64;
    let progress = (minute / 90.0).clamp(0.0, 1.0);
    let remaining = (90.0 - minute).max(0.0);

    let per90 = ctx.historical.per90(market);
    let live_rate = per_minute(current, minute, per90);
    let naive = current + live_rate * remaining;
    let enriched = finite_or(ctx.enriched.projections.for_market(market), naive);

    let trend = trend_for(market, ctx.trends);
    let (method, raw) = match trend {
        Some(t) if ctx.history_len >= 2 && t.confidence > cfg.trend_min_confidence => {
            let (w_trend, w_enriched, w_live) = cfg.trend_blend;
            let blend = w_trend * t.projected_total_with_trend + w_enriched * enriched + w_live * naive;
            (ProjectionMethod::TrendBlend, blend)
        }
        _ if ctx.minute >= cfg.early_minute => {
            let w_rate = ctx
                .weights
                .for_market(market)
                .map(|w| w.get(WeightFactor::CurrentRate))
                .unwrap_or(0.5)
                .clamp(0.0, 1.0);
            (ProjectionMethod::EnrichedBlend, w_rate * naive + (1.0 - w_rate) * enriched)
        }
        _ => {
            let hist_rate = per90 / 90.0;
            let rate = progress * live_rate + (1.0 - progress) * hist_rate;
            (ProjectionMethod::HistoricalBlend, current + rate * remaining)
        }
    };
    // A count never shrinks below what has already happened.
    let projected = finite_or(raw, current).max(current);

    let thresholds = ctx.risk.thresholds(market);
    let required_margin = thresholds.min_safety_margin * (1.0 - cfg.margin_progress_shrink * progress);

    let lines = cfg.thresholds.get(&market).map(Vec::as_slice).unwrap_or(&[]);
    let mut predictions = Vec::new();
    for &threshold in lines {
        if current > threshold {
            // Already over the line; nothing left to decide.
            continue;
        }
        let margin = safety_margin(projected, threshold);
        if margin <= required_margin {
            continue;
        }
        let direction = if projected > threshold {
            Direction::Over
        } else {
            Direction::Under
        };

        let mut confidence = thresholds.base_confidence;
        confidence += (margin * cfg.distance_bonus_per_unit).min(cfg.max_distance_bonus);
        confidence += cfg.time_bonus * progress;
        if ctx.minute > 0 {
            let aligned = match direction {
                Direction::Over => naive > threshold,
                Direction::Under => naive < threshold,
            };
            confidence += if aligned {
                cfg.alignment_bonus
            } else {
                -cfg.misalignment_penalty
            };
        }
        let confidence = finite_or(confidence, 0.0).clamp(0.0, cfg.max_confidence);

        predictions.push(MarketPrediction {
            market,
            threshold,
            direction,
            projected_value: projected,
            confidence,
            safety_margin: margin,
            reasoning: format!(
                "{market} {direction:?} {threshold}: projected {projected:.2} from {current} at {}' ({method:?})",
                ctx.minute
            ),
        });
    }

    let best_pick = most_confident(&predictions, |p| p.confidence);

    OverUnderMarket {
        market,
        current_value: current,
        projected,
        method,
        predictions,
        best_pick,
    }
}

/// First item with the highest confidence; ties keep the earlier line.
fn most_confident<T: Clone>(items: &[T], confidence: impl Fn(&T) -> f64) -> Option<T> {
    let mut best: Option<&T> = None;
    for item in items {
        if best.is_none_or(|b| confidence(item) > confidence(b)) {
            best = Some(item);
        }
    }
    best.cloned()
}

fn trend_for(market: Market, trends: &TrendReport) -> Option<&TrendResult> {
    let stat = match market {
        Market::Goals => TrackedStat::Goals,
        Market::Corners => TrackedStat::Corners,
        Market::Fouls => TrackedStat::Fouls,
        Market::Cards => TrackedStat::Cards,
        Market::Shots => TrackedStat::Shots,
        Market::ShotsOnTarget => TrackedStat::ShotsOnTarget,
        Market::ThrowIns => TrackedStat::ThrowIns,
        Market::Offsides => TrackedStat::Offsides,
        Market::Btts | Market::MatchResult => return None,
    };
    trends.get(&stat).map(|t| &t.combined)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutcomeSelection {
    BttsYes,
    BttsNo,
    HomeWin,
    Draw,
    AwayWin,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomePrediction {
    pub market: Market,
    pub selection: OutcomeSelection,
    pub probability: f64,
    pub confidence: f64,
    pub safety_margin: f64,
    pub reasoning: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeMarket {
    pub market: Market,
    pub predictions: Vec<OutcomePrediction>,
    pub best_pick: Option<OutcomePrediction>,
}

/// Price BTTS and the match result from a Poisson model of the goals still
/// to come for each side.
pub fn project_outcomes(
    home_score: u8,
    away_score: u8,
    ctx: &ProjectionContext<'_>,
) -> Vec<OutcomeMarket> {
    let cfg = ctx.config;
    let (lambda_home, lambda_away) = remaining_lambdas(home_score, away_score, ctx);

    let scored = |goals: u8, lambda: f64| if goals > 0 { 1.0 } else { 1.0 - (-lambda).exp() };
    let both_scored = home_score > 0 && away_score > 0;
    let p_yes = (scored(home_score, lambda_home) * scored(away_score, lambda_away)).clamp(0.0, 1.0);

    let score_weight = ctx
        .weights
        .family(MarketFamily::Btts)
        .map(|w| w.get(WeightFactor::CurrentScore))
        .unwrap_or(0.0)
        .clamp(0.0, 1.0);
    let btts_confidence = |p: f64, decided: f64| {
        let model = p * 100.0;
        let signal = if both_scored { decided } else { model };
        ((1.0 - score_weight) * model + score_weight * signal).clamp(0.0, cfg.max_confidence)
    };

    let btts = outcome_market(
        Market::Btts,
        vec![
            outcome(
                Market::Btts,
                OutcomeSelection::BttsYes,
                p_yes,
                btts_confidence(p_yes, 100.0),
                lambda_home,
                lambda_away,
            ),
            outcome(
                Market::Btts,
                OutcomeSelection::BttsNo,
                1.0 - p_yes,
                btts_confidence(1.0 - p_yes, 0.0),
                lambda_home,
                lambda_away,
            ),
        ],
    );

    let (p_home, p_draw, p_away) = outcome_probs_poisson(
        home_score as u32,
        away_score as u32,
        lambda_home,
        lambda_away,
        cfg.max_goals_per_side,
    );
    let result_confidence = |p: f64| (p * 100.0).clamp(0.0, cfg.max_confidence);
    let result = outcome_market(
        Market::MatchResult,
        [
            (OutcomeSelection::HomeWin, p_home),
            (OutcomeSelection::Draw, p_draw),
            (OutcomeSelection::AwayWin, p_away),
        ]
        .into_iter()
        .map(|(selection, p)| {
            outcome(
                Market::MatchResult,
                selection,
                p,
                result_confidence(p),
                lambda_home,
                lambda_away,
            )
        })
        .collect(),
    );

    vec![btts, result]
}

fn remaining_lambdas(home_score: u8, away_score: u8, ctx: &ProjectionContext<'_>) -> (f64, f64) {
    if ctx.minute >= 90 {
        return (0.0, 0.0);
    }
    let floor = ctx.config.min_remaining_lambda;
    let p = &ctx.enriched.projections;
    let home = finite_or(p.home_goals - home_score as f64, 0.0).max(floor);
    let away = finite_or(p.away_goals - away_score as f64, 0.0).max(floor);
    (home, away)
}

fn outcome(
    market: Market,
    selection: OutcomeSelection,
    probability: f64,
    confidence: f64,
    lambda_home: f64,
    lambda_away: f64,
) -> OutcomePrediction {
    let probability = finite_or(probability, 0.0).clamp(0.0, 1.0);
    OutcomePrediction {
        market,
        selection,
        probability,
        confidence: finite_or(confidence, 0.0),
        safety_margin: outcome_safety_margin(probability),
        reasoning: format!(
            "{selection:?} at {:.1}% with remaining xG {lambda_home:.2}/{lambda_away:.2}",
            probability * 100.0
        ),
    }
}

fn outcome_market(market: Market, predictions: Vec<OutcomePrediction>) -> OutcomeMarket {
    let best_pick = most_confident(&predictions, |p| p.confidence);
    OutcomeMarket {
        market,
        predictions,
        best_pick,
    }
}

/// Home/draw/away probabilities from independent Poisson goals still to come.
pub fn outcome_probs_poisson(
    goals_home: u32,
    goals_away: u32,
    lambda_home_rem: f64,
    lambda_away_rem: f64,
    max_goals: u32,
) -> (f64, f64, f64) {
    let lead = goals_home as i64 - goals_away as i64;
    let home_more = remaining_goals_pmf(lambda_home_rem, max_goals);
    let away_more = remaining_goals_pmf(lambda_away_rem, max_goals);

    let (mut home, mut draw, mut away) = (0.0, 0.0, 0.0);
    for (i, p_i) in home_more.iter().enumerate() {
        for (j, p_j) in away_more.iter().enumerate() {
            let bucket = match (lead + i as i64 - j as i64).signum() {
                1 => &mut home,
                0 => &mut draw,
                _ => &mut away,
            };
            *bucket += p_i * p_j;
        }
    }

    let total = home + draw + away;
    if total > 0.0 && total.is_finite() {
        (home / total, draw / total, away / total)
    } else {
        (1.0 / 3.0, 1.0 / 3.0, 1.0 / 3.0)
    }
}

/// P(k more goals) for k in `0..=cap`; whatever lies past `cap` is credited to `cap`.
fn remaining_goals_pmf(lambda: f64, cap: u32) -> Vec<f64> {
    let lambda = finite_or(lambda, 0.0).max(0.0);
    let mut pmf: Vec<f64> = (1..=cap)
        .scan((-lambda).exp(), |p, k| {
            let here = *p;
            *p *= lambda / k as f64;
            Some(here)
        })
        .collect();
    let below_cap: f64 = pmf.iter().sum();
    pmf.push((1.0 - below_cap).max(0.0));
    pmf
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalysisConfig;
    use crate::enrichment::enrich;
    use crate::snapshot::{MatchSnapshot, SideStats};
    use crate::weights::compute_weights;

    struct Fixture {
        cfg: AnalysisConfig,
        enriched: EnrichedMetrics,
        weights: DynamicWeights,
        trends: TrendReport,
    }

    impl Fixture {
        fn new(snapshot: &MatchSnapshot) -> Self {
            let cfg = AnalysisConfig::default();
            let enriched = enrich(
                snapshot,
                snapshot.home_score,
                snapshot.away_score,
                snapshot.minute,
                &cfg.historical,
                &cfg.enrichment,
            );
            let weights = compute_weights(
                snapshot.minute,
                snapshot.home_score,
                snapshot.away_score,
                enriched.context.game_state,
                0.1,
                enriched.context.intensity,
                &cfg.weights,
            );
            Self {
                cfg,
                enriched,
                weights,
                trends: TrendReport::new(),
            }
        }

        fn ctx(&self, minute: u16) -> ProjectionContext<'_> {
            ProjectionContext {
                enriched: &self.enriched,
                trends: &self.trends,
                weights: &self.weights,
                history_len: 1,
                minute,
                config: &self.cfg.projection,
                historical: &self.cfg.historical,
                risk: &self.cfg.risk,
            }
        }
    }

    fn snapshot(minute: u16, home_corners: u32, away_corners: u32) -> MatchSnapshot {
        MatchSnapshot {
            minute,
            home: SideStats {
                possession: 55.0,
                corners: home_corners,
                total_shots: 6,
                shots_on_target: 2,
                fouls: 6,
                passes: 200,
                ..SideStats::default()
            },
            away: SideStats {
                possession: 45.0,
                corners: away_corners,
                total_shots: 4,
                shots_on_target: 1,
                fouls: 7,
                passes: 160,
                ..SideStats::default()
            },
            ..MatchSnapshot::default()
        }
    }

    #[test]
    fn mid_match_without_history_uses_enriched_blend() {
        let snap = snapshot(40, 4, 3);
        let fx = Fixture::new(&snap);
        let m = project(Market::Corners, 7.0, &fx.ctx(40));
        assert_eq!(m.method, ProjectionMethod::EnrichedBlend);
        assert!(m.projected >= 7.0);
    }

    #[test]
    fn early_match_uses_historical_blend() {
        let snap = snapshot(8, 1, 0);
        let fx = Fixture::new(&snap);
        let m = project(Market::Corners, 1.0, &fx.ctx(8));
        assert_eq!(m.method, ProjectionMethod::HistoricalBlend);
        assert!(m.projected > 1.0);
    }

    #[test]
    fn projection_never_shrinks_with_higher_count() {
        let snap = snapshot(55, 5, 4);
        let fx = Fixture::new(&snap);
        let ctx = fx.ctx(55);
        let mut last = 0.0;
        for count in 0..30 {
            let m = project(Market::Corners, count as f64, &ctx);
            assert!(m.projected >= last, "{count}: {} < {last}", m.projected);
            assert!(m.projected >= count as f64);
            last = m.projected;
        }
    }

    #[test]
    fn settled_lines_are_skipped_and_confidence_capped() {
        let snap = snapshot(70, 6, 5);
        let fx = Fixture::new(&snap);
        let m = project(Market::Corners, 11.0, &fx.ctx(70));
        assert!(m.predictions.iter().all(|p| p.threshold > 11.0));
        for p in &m.predictions {
            assert!(p.confidence <= 95.0 && p.confidence >= 0.0);
            assert!(p.safety_margin.is_finite());
        }
        if let Some(best) = &m.best_pick {
            let max = m
                .predictions
                .iter()
                .map(|p| p.confidence)
                .fold(f64::MIN, f64::max);
            assert_eq!(best.confidence, max);
        }
    }

    #[test]
    fn btts_no_is_less_confident_once_both_scored() {
        let mut snap = snapshot(60, 4, 3);
        snap.home_score = 2;
        snap.away_score = 3;
        let fx = Fixture::new(&snap);
        let outcomes = project_outcomes(2, 3, &fx.ctx(60));
        let btts = outcomes.iter().find(|m| m.market == Market::Btts).unwrap();
        let conf = |sel| {
            btts.predictions
                .iter()
                .find(|p| p.selection == sel)
                .map(|p| p.confidence)
                .unwrap()
        };
        assert!(conf(OutcomeSelection::BttsNo) < conf(OutcomeSelection::BttsYes));
        assert_eq!(btts.best_pick.as_ref().unwrap().selection, OutcomeSelection::BttsYes);
    }

    #[test]
    fn match_result_probabilities_sum_to_one() {
        let snap = snapshot(30, 2, 2);
        let fx = Fixture::new(&snap);
        let outcomes = project_outcomes(0, 0, &fx.ctx(30));
        let result = outcomes.iter().find(|m| m.market == Market::MatchResult).unwrap();
        let sum: f64 = result.predictions.iter().map(|p| p.probability).sum();
        assert!((sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn big_lead_late_favours_leader() {
        let (h, d, a) = outcome_probs_poisson(3, 0, 0.1, 0.1, 10);
        assert!(h > 0.99);
        assert!(d < 0.01 && a < 0.01);
    }

    #[test]
    fn most_confident_keeps_the_first_of_equal_picks() {
        let picks = [(1.5, 70.0), (2.5, 82.0), (3.5, 82.0), (4.5, 40.0)];
        assert_eq!(most_confident(&picks, |p| p.1), Some((2.5, 82.0)));
        assert_eq!(most_confident(&[] as &[(f64, f64)], |p| p.1), None);
    }

    #[test]
    fn remaining_goals_pmf_folds_the_tail_into_the_cap() {
        let pmf = remaining_goals_pmf(1.2, 3);
        assert_eq!(pmf.len(), 4);
        assert!((pmf.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        assert!((pmf[0] - (-1.2f64).exp()).abs() < 1e-12);
        assert!(pmf[3] > 1.2f64.powi(3) / 6.0 * (-1.2f64).exp());
        assert_eq!(remaining_goals_pmf(f64::NAN, 2), vec![1.0, 0.0, 0.0]);
    }
}
