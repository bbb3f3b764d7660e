//! Match-level oddity detection.
//!
//! Five independent detectors look for situations the projection models were
//! not tuned for (a likely red card, a siege, a goal fest...). Each reports at
//! most one anomaly; the combined report carries a confidence adjustment the
//! pipeline applies to every affected market.

use serde::{Deserialize, Serialize};

use crate::config::AnomalyConfig;
use crate::snapshot::{Market, MatchSnapshot, SideStats};
use crate::validator::Severity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnomalyKind {
    SuspectedRedCard,
    VeryDefensive,
    VeryOffensive,
    ExtremeDominance,
    UnusualStatRatio,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecommendedAction {
    Proceed,
    Caution,
    ReduceStakes,
    AvoidBetting,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anomaly {
    pub kind: AnomalyKind,
    pub severity: Severity,
    pub description: String,
    pub confidence_adjustment: f64,
    pub affected_markets: Vec<Market>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyReport {
    pub anomalies: Vec<Anomaly>,
    pub overall_severity: Severity,
    pub recommended_action: RecommendedAction,
    pub confidence_adjustment: f64,
}

impl AnomalyReport {
    pub fn empty() -> Self {
        Self {
            anomalies: Vec::new(),
            overall_severity: Severity::Ok,
            recommended_action: RecommendedAction::Proceed,
            confidence_adjustment: 0.0,
        }
    }

    /// Adjustment to apply to one market's confidence, damped the same way as
    /// the overall figure when several anomalies fire together.
    pub fn adjustment_for(&self, market: Market, cfg: &AnomalyConfig) -> f64 {
        let raw: f64 = self
            .anomalies
            .iter()
            .filter(|a| a.affected_markets.contains(&market))
            .map(|a| a.confidence_adjustment)
            .sum();
        if self.anomalies.len() > 1 {
            raw * cfg.multi_anomaly_factor
        } else {
            raw
        }
    }
}

pub fn detect(snapshot: &MatchSnapshot, cfg: &AnomalyConfig) -> AnomalyReport {
    if snapshot.minute < cfg.min_minute {
        return AnomalyReport::empty();
    }

    let anomalies: Vec<Anomaly> = [
        detect_red_card(snapshot, cfg),
        detect_very_defensive(snapshot, cfg),
        detect_very_offensive(snapshot, cfg),
        detect_extreme_dominance(snapshot, cfg),
        detect_unusual_ratios(snapshot, cfg),
    ]
    .into_iter()
    .flatten()
    .collect();

    if anomalies.is_empty() {
        return AnomalyReport::empty();
    }

    let max_severity = anomalies
        .iter()
        .map(|a| a.severity)
        .max()
        .unwrap_or(Severity::Ok);
    let count = anomalies.len();
    let overall_severity = if max_severity == Severity::Critical || count >= 4 {
        Severity::Critical
    } else if max_severity == Severity::High || count >= 3 {
        Severity::High
    } else if max_severity == Severity::Medium || count >= 2 {
        Severity::Medium
    } else {
        Severity::Low
    };

    let mut confidence_adjustment: f64 = anomalies.iter().map(|a| a.confidence_adjustment).sum();
    if count > 1 {
        confidence_adjustment *= cfg.multi_anomaly_factor;
    }

    AnomalyReport {
        anomalies,
        overall_severity,
        recommended_action: action_for(overall_severity),
        confidence_adjustment,
    }
}

fn action_for(severity: Severity) -> RecommendedAction {
    match severity {
        Severity::Ok => RecommendedAction::Proceed,
        Severity::Low | Severity::Medium => RecommendedAction::Caution,
        Severity::High => RecommendedAction::ReduceStakes,
        Severity::Critical => RecommendedAction::AvoidBetting,
    }
}

fn anomaly(
    kind: AnomalyKind,
    severity: Severity,
    description: String,
    confidence_adjustment: f64,
    affected_markets: &[Market],
) -> Option<Anomaly> {
    Some(Anomaly {
        kind,
        severity,
        description,
        confidence_adjustment,
        affected_markets: affected_markets.to_vec(),
    })
}

fn gap(a: u32, b: u32) -> u32 {
    a.abs_diff(b)
}

fn detect_red_card(s: &MatchSnapshot, cfg: &AnomalyConfig) -> Option<Anomaly> {
    let possession_gap = (s.home.possession - s.away.possession).abs();
    let foul_gap = gap(s.home.fouls, s.away.fouls);
    if s.minute > cfg.red_card_minute
        && possession_gap > cfg.red_card_possession_gap
        && foul_gap < cfg.red_card_max_foul_gap
    {
        return anomaly(
            AnomalyKind::SuspectedRedCard,
            Severity::High,
            format!(
                "possession gap {possession_gap:.0}% without a matching foul gap suggests a side is down a player"
            ),
            cfg.red_card_adjustment,
            &[Market::Goals, Market::Corners, Market::Shots, Market::ShotsOnTarget, Market::Btts, Market::MatchResult],
        );
    }
    let yellows = s.total(|x| x.yellow_cards);
    if s.minute > cfg.yellow_flood_minute && yellows > cfg.yellow_flood_total {
        return anomaly(
            AnomalyKind::SuspectedRedCard,
            Severity::Medium,
            format!("{yellows} yellow cards make a dismissal likely"),
            cfg.yellow_flood_adjustment,
            &[Market::Cards, Market::Fouls, Market::Goals, Market::MatchResult],
        );
    }
    None
}

fn detect_very_defensive(s: &MatchSnapshot, cfg: &AnomalyConfig) -> Option<Anomaly> {
    let sot = s.total(|x| x.shots_on_target);
    if s.minute > cfg.defensive_sot_minute && sot < cfg.defensive_sot_max {
        return anomaly(
            AnomalyKind::VeryDefensive,
            Severity::Low,
            format!("only {sot} shots on target by minute {}", s.minute),
            cfg.defensive_sot_adjustment,
            &[Market::Goals, Market::ShotsOnTarget, Market::Shots, Market::Btts],
        );
    }
    let corners = s.total(|x| x.corners);
    if s.minute > cfg.defensive_corners_minute && corners < cfg.defensive_corners_max {
        return anomaly(
            AnomalyKind::VeryDefensive,
            Severity::Low,
            format!("only {corners} corners by minute {}", s.minute),
            cfg.defensive_corners_adjustment,
            &[Market::Corners],
        );
    }
    if s.minute > cfg.goalless_minute && s.total_goals() == 0 {
        return anomaly(
            AnomalyKind::VeryDefensive,
            Severity::Low,
            format!("goalless at minute {}", s.minute),
            cfg.goalless_adjustment,
            &[Market::Goals, Market::Btts, Market::MatchResult],
        );
    }
    None
}

fn detect_very_offensive(s: &MatchSnapshot, cfg: &AnomalyConfig) -> Option<Anomaly> {
    let goals = s.total_goals();
    if goals >= cfg.goal_fest_total {
        return anomaly(
            AnomalyKind::VeryOffensive,
            Severity::High,
            format!("{goals} goals already scored"),
            cfg.goal_fest_adjustment,
            &[Market::Goals, Market::Btts, Market::MatchResult],
        );
    }
    let goals_per_ten = goals as f64 / s.minute.max(1) as f64 * 10.0;
    if s.minute > cfg.goal_rate_minute && goals_per_ten > cfg.goal_rate_per_ten {
        return anomaly(
            AnomalyKind::VeryOffensive,
            Severity::Medium,
            format!("{goals_per_ten:.2} goals per ten minutes"),
            cfg.goal_rate_adjustment,
            &[Market::Goals, Market::Btts],
        );
    }
    let sot = s.total(|x| x.shots_on_target);
    if s.minute > cfg.offensive_sot_minute && sot > cfg.offensive_sot_min {
        return anomaly(
            AnomalyKind::VeryOffensive,
            Severity::Low,
            format!("{sot} shots on target by minute {}", s.minute),
            cfg.offensive_sot_adjustment,
            &[Market::Goals, Market::ShotsOnTarget],
        );
    }
    None
}

fn detect_extreme_dominance(s: &MatchSnapshot, cfg: &AnomalyConfig) -> Option<Anomaly> {
    let possession_gap = (s.home.possession - s.away.possession).abs();
    if s.minute > cfg.dominance_possession_minute && possession_gap > cfg.dominance_possession_gap {
        return anomaly(
            AnomalyKind::ExtremeDominance,
            Severity::Medium,
            format!("possession gap of {possession_gap:.0}%"),
            cfg.dominance_possession_adjustment,
            &[Market::Corners, Market::Shots, Market::Btts, Market::MatchResult],
        );
    }
    let shot_gap = gap(s.home.total_shots, s.away.total_shots);
    if s.minute > cfg.dominance_shot_minute && shot_gap > cfg.dominance_shot_gap {
        return anomaly(
            AnomalyKind::ExtremeDominance,
            Severity::Medium,
            format!("shot gap of {shot_gap}"),
            cfg.dominance_shot_adjustment,
            &[Market::Shots, Market::ShotsOnTarget, Market::Btts],
        );
    }
    let corner_gap = gap(s.home.corners, s.away.corners);
    if s.minute > cfg.dominance_corner_minute && corner_gap > cfg.dominance_corner_gap {
        return anomaly(
            AnomalyKind::ExtremeDominance,
            Severity::Low,
            format!("corner gap of {corner_gap}"),
            cfg.dominance_corner_adjustment,
            &[Market::Corners],
        );
    }
    None
}

fn detect_unusual_ratios(s: &MatchSnapshot, cfg: &AnomalyConfig) -> Option<Anomaly> {
    if s.minute <= cfg.ratio_minute {
        return None;
    }
    let goals = s.total_goals();
    let sot = s.total(|x| x.shots_on_target);
    let shots = s.total(|x| x.total_shots);
    if sot >= cfg.wasteful_sot_min && goals == 0 {
        return anomaly(
            AnomalyKind::UnusualStatRatio,
            Severity::Medium,
            format!("{sot} shots on target without a goal"),
            cfg.wasteful_adjustment,
            &[Market::Goals, Market::Btts],
        );
    }
    if shots < cfg.clinical_shots_max && goals >= cfg.clinical_goals_min {
        return anomaly(
            AnomalyKind::UnusualStatRatio,
            Severity::Medium,
            format!("{goals} goals from only {shots} shots"),
            cfg.clinical_adjustment,
            &[Market::Goals, Market::Shots],
        );
    }
    let fouls = s.total(|x| x.fouls);
    let cards = s.total(SideStats::cards);
    if fouls >= cfg.lenient_fouls_min && cards <= cfg.lenient_cards_max {
        return anomaly(
            AnomalyKind::UnusualStatRatio,
            Severity::Low,
            format!("{fouls} fouls but only {cards} cards"),
            cfg.discipline_adjustment,
            &[Market::Cards],
        );
    }
    if fouls <= cfg.strict_fouls_max && cards >= cfg.strict_cards_min {
        return anomaly(
            AnomalyKind::UnusualStatRatio,
            Severity::Low,
            format!("{cards} cards from only {fouls} fouls"),
            cfg.discipline_adjustment,
            &[Market::Cards, Market::Fouls],
        );
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn even_match(minute: u16) -> MatchSnapshot {
        MatchSnapshot {
            minute,
            home_score: 1,
            away_score: 1,
            home: SideStats {
                possession: 50.0,
                total_shots: 10,
                shots_on_target: 4,
                corners: 5,
                fouls: 11,
                yellow_cards: 2,
                ..SideStats::default()
            },
            away: SideStats {
                possession: 50.0,
                total_shots: 9,
                shots_on_target: 4,
                corners: 4,
                fouls: 12,
                yellow_cards: 2,
                ..SideStats::default()
            },
        }
    }

    #[test]
    fn quiet_early_match_has_no_anomalies() {
        let snap = MatchSnapshot {
            minute: 10,
            ..MatchSnapshot::default()
        };
        let report = detect(&snap, &AnomalyConfig::default());
        assert!(report.anomalies.is_empty());
        assert_eq!(report.overall_severity, Severity::Ok);
        assert_eq!(report.recommended_action, RecommendedAction::Proceed);
    }

    #[test]
    fn detectors_are_silent_before_minute_five() {
        let mut snap = even_match(3);
        snap.home_score = 4;
        snap.away_score = 3;
        let report = detect(&snap, &AnomalyConfig::default());
        assert!(report.anomalies.is_empty());
    }

    #[test]
    fn possession_gap_without_fouls_flags_red_card() {
        let mut snap = even_match(40);
        snap.home.possession = 70.0;
        snap.away.possession = 30.0;
        let report = detect(&snap, &AnomalyConfig::default());
        let red = report
            .anomalies
            .iter()
            .find(|a| a.kind == AnomalyKind::SuspectedRedCard)
            .expect("red card anomaly");
        assert_eq!(red.confidence_adjustment, -20.0);
    }

    #[test]
    fn multiple_anomalies_are_damped() {
        let mut snap = even_match(40);
        snap.home.possession = 72.0;
        snap.away.possession = 28.0;
        let cfg = AnomalyConfig::default();
        let report = detect(&snap, &cfg);
        // red card (-20) and extreme possession dominance (-8)
        assert_eq!(report.anomalies.len(), 2);
        assert!((report.confidence_adjustment - (-28.0 * 0.7)).abs() < 1e-9);
        assert_eq!(report.overall_severity, Severity::High);
        assert_eq!(report.recommended_action, RecommendedAction::ReduceStakes);
    }

    #[test]
    fn goal_fest_is_flagged_at_any_minute_after_five() {
        let mut snap = even_match(20);
        snap.home_score = 4;
        snap.away_score = 2;
        let report = detect(&snap, &AnomalyConfig::default());
        assert!(report.anomalies.iter().any(|a| a.kind == AnomalyKind::VeryOffensive
            && a.confidence_adjustment == -15.0));
    }

    #[test]
    fn adjustment_for_only_counts_affected_markets() {
        let mut snap = even_match(80);
        snap.home_score = 0;
        snap.away_score = 0;
        snap.home.shots_on_target = 1;
        snap.away.shots_on_target = 1;
        let cfg = AnomalyConfig::default();
        let report = detect(&snap, &cfg);
        assert_eq!(report.anomalies.len(), 1);
        assert_eq!(report.adjustment_for(Market::Goals, &cfg), -10.0);
        assert_eq!(report.adjustment_for(Market::Fouls, &cfg), 0.0);
    }
}
