//! Grading of published predictions once the final whistle has gone.

use serde::{Deserialize, Serialize};

use crate::projection::{Direction, MarketPrediction, OutcomePrediction, OutcomeSelection};
use crate::snapshot::MatchSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Grade {
    Won,
    Lost,
    Push,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Settled {
    /// Stated probability, taken from the prediction's confidence.
    pub probability: f64,
    pub grade: Grade,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SettlementMetrics {
    pub samples: usize,
    pub won: usize,
    pub lost: usize,
    pub pushed: usize,
    pub hit_rate: f64,
    pub brier: f64,
    pub log_loss: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationBin {
    pub bucket_start: f64,
    pub bucket_end: f64,
    pub count: usize,
    pub avg_pred: f64,
    pub actual_rate: f64,
}

pub fn grade_line(prediction: &MarketPrediction, final_snapshot: &MatchSnapshot) -> Grade {
    let total = final_snapshot.market_count(prediction.market);
    if total == prediction.threshold {
        return Grade::Push;
    }
    let over = total > prediction.threshold;
    match (prediction.direction, over) {
        (Direction::Over, true) | (Direction::Under, false) => Grade::Won,
        _ => Grade::Lost,
    }
}

pub fn grade_outcome(prediction: &OutcomePrediction, final_snapshot: &MatchSnapshot) -> Grade {
    let (home, away) = (final_snapshot.home_score, final_snapshot.away_score);
    let hit = match prediction.selection {
        OutcomeSelection::BttsYes => final_snapshot.both_scored(),
        OutcomeSelection::BttsNo => !final_snapshot.both_scored(),
        OutcomeSelection::HomeWin => home > away,
        OutcomeSelection::Draw => home == away,
        OutcomeSelection::AwayWin => home < away,
    };
    if hit { Grade::Won } else { Grade::Lost }
}

pub fn settle_lines(predictions: &[MarketPrediction], final_snapshot: &MatchSnapshot) -> Vec<Settled> {
    predictions
        .iter()
        .map(|p| Settled {
            probability: (p.confidence / 100.0).clamp(0.0, 1.0),
            grade: grade_line(p, final_snapshot),
        })
        .collect()
}

pub fn settle_outcomes(predictions: &[OutcomePrediction], final_snapshot: &MatchSnapshot) -> Vec<Settled> {
    predictions
        .iter()
        .map(|p| Settled {
            probability: (p.confidence / 100.0).clamp(0.0, 1.0),
            grade: grade_outcome(p, final_snapshot),
        })
        .collect()
}

/// Hit rate, Brier score and log loss over the decided (non-push) picks.
pub fn evaluate(settled: &[Settled]) -> SettlementMetrics {
    let pushed = settled.iter().filter(|s| s.grade == Grade::Push).count();
    let decided: Vec<&Settled> = settled.iter().filter(|s| s.grade != Grade::Push).collect();
    if decided.is_empty() {
        return SettlementMetrics {
            samples: 0,
            won: 0,
            lost: 0,
            pushed,
            hit_rate: 0.0,
            brier: 0.0,
            log_loss: 0.0,
        };
    }

    let mut brier_sum = 0.0_f64;
    let mut log_loss_sum = 0.0_f64;
    let mut won = 0usize;
    for s in &decided {
        let y = if s.grade == Grade::Won { 1.0 } else { 0.0 };
        brier_sum += (s.probability - y).powi(2);
        let actual_prob = if y > 0.0 { s.probability } else { 1.0 - s.probability }.clamp(1e-12, 1.0);
        log_loss_sum += -actual_prob.ln();
        if y > 0.0 {
            won += 1;
        }
    }

    let n = decided.len() as f64;
    SettlementMetrics {
        samples: decided.len(),
        won,
        lost: decided.len() - won,
        pushed,
        hit_rate: won as f64 / n,
        brier: brier_sum / n,
        log_loss: log_loss_sum / n,
    }
}

pub fn calibration_bins(settled: &[Settled], bins: usize) -> Vec<CalibrationBin> {
    let bins = bins.max(2);
    let mut counts = vec![0usize; bins];
    let mut pred_sum = vec![0.0_f64; bins];
    let mut actual_sum = vec![0.0_f64; bins];

    for s in settled.iter().filter(|s| s.grade != Grade::Push) {
        let p = s.probability.clamp(0.0, 1.0);
        let idx = ((p * bins as f64).floor() as usize).min(bins - 1);
        counts[idx] += 1;
        pred_sum[idx] += p;
        if s.grade == Grade::Won {
            actual_sum[idx] += 1.0;
        }
    }

    (0..bins)
        .map(|i| {
            let count = counts[i];
            let (avg_pred, actual_rate) = if count > 0 {
                (pred_sum[i] / count as f64, actual_sum[i] / count as f64)
            } else {
                (0.0, 0.0)
            };
            CalibrationBin {
                bucket_start: i as f64 / bins as f64,
                bucket_end: (i + 1) as f64 / bins as f64,
                count,
                avg_pred,
                actual_rate,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::{Market, SideStats};

    fn line(market: Market, threshold: f64, direction: Direction, confidence: f64) -> MarketPrediction {
        MarketPrediction {
            market,
            threshold,
            direction,
            projected_value: 0.0,
            confidence,
            safety_margin: 0.0,
            reasoning: String::new(),
        }
    }

    fn full_time() -> MatchSnapshot {
        MatchSnapshot {
            minute: 90,
            home_score: 2,
            away_score: 1,
            home: SideStats {
                corners: 6,
                ..SideStats::default()
            },
            away: SideStats {
                corners: 4,
                ..SideStats::default()
            },
        }
    }

    #[test]
    fn lines_grade_against_final_totals() {
        let ft = full_time();
        assert_eq!(grade_line(&line(Market::Corners, 9.5, Direction::Over, 80.0), &ft), Grade::Won);
        assert_eq!(grade_line(&line(Market::Corners, 10.5, Direction::Over, 80.0), &ft), Grade::Lost);
        assert_eq!(grade_line(&line(Market::Goals, 3.5, Direction::Under, 80.0), &ft), Grade::Won);
        assert_eq!(grade_line(&line(Market::Corners, 10.0, Direction::Under, 80.0), &ft), Grade::Push);
    }

    #[test]
    fn perfect_confident_picks_have_zero_brier() {
        let ft = full_time();
        let preds = vec![
            line(Market::Corners, 9.5, Direction::Over, 100.0),
            line(Market::Goals, 3.5, Direction::Under, 100.0),
        ];
        let m = evaluate(&settle_lines(&preds, &ft));
        assert_eq!(m.samples, 2);
        assert_eq!(m.hit_rate, 1.0);
        assert!(m.brier < 1e-12);
    }

    #[test]
    fn pushes_are_excluded_from_metrics() {
        let ft = full_time();
        let preds = vec![
            line(Market::Corners, 10.0, Direction::Over, 70.0),
            line(Market::Corners, 12.5, Direction::Over, 70.0),
        ];
        let m = evaluate(&settle_lines(&preds, &ft));
        assert_eq!(m.pushed, 1);
        assert_eq!(m.samples, 1);
        assert_eq!(m.lost, 1);
        assert!((m.brier - 0.49).abs() < 1e-9);
    }

    #[test]
    fn outcome_selections_grade() {
        let ft = full_time();
        let pick = |selection| OutcomePrediction {
            market: Market::MatchResult,
            selection,
            probability: 0.5,
            confidence: 50.0,
            safety_margin: 0.0,
            reasoning: String::new(),
        };
        assert_eq!(grade_outcome(&pick(OutcomeSelection::HomeWin), &ft), Grade::Won);
        assert_eq!(grade_outcome(&pick(OutcomeSelection::Draw), &ft), Grade::Lost);
        assert_eq!(grade_outcome(&pick(OutcomeSelection::BttsYes), &ft), Grade::Won);
    }

    #[test]
    fn bins_cover_unit_interval() {
        let settled = [
            Settled { probability: 0.05, grade: Grade::Lost },
            Settled { probability: 0.95, grade: Grade::Won },
            Settled { probability: 1.0, grade: Grade::Won },
        ];
        let bins = calibration_bins(&settled, 10);
        assert_eq!(bins.len(), 10);
        assert_eq!(bins[0].count, 1);
        assert_eq!(bins[9].count, 2);
        assert_eq!(bins[9].actual_rate, 1.0);
    }
}
