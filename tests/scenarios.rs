use inplay_analyzer::anomaly;
use inplay_analyzer::config::AnomalyConfig;
use inplay_analyzer::enrichment::per_minute;
use inplay_analyzer::projection::{OutcomeSelection, ProjectionMethod};
use inplay_analyzer::trend::{TrackedStat, TrendDirection};
use inplay_analyzer::validator::Severity;
use inplay_analyzer::weights::{MarketFamily, WeightFactor};
use inplay_analyzer::{AnalysisConfig, LiveAnalyzer, Market, MatchSnapshot, SideStats, SnapshotHistory};

fn corners_snapshot(minute: u16, home_corners: u32, away_corners: u32) -> MatchSnapshot {
    MatchSnapshot {
        minute,
        home: SideStats {
            possession: 55.0,
            corners: home_corners,
            ..SideStats::default()
        },
        away: SideStats {
            possession: 45.0,
            corners: away_corners,
            ..SideStats::default()
        },
        ..MatchSnapshot::default()
    }
}

#[test]
fn corners_without_history_blend_enrichment_and_live_rate() {
    let snap = corners_snapshot(40, 4, 3);
    let report = LiveAnalyzer::default()
        .analyze("scenario-a", &snap, &SnapshotHistory::new())
        .expect("snapshot is valid");

    let corners = report.market(Market::Corners).expect("corners market");
    assert_eq!(corners.current_value, 7.0);
    assert_eq!(corners.method, ProjectionMethod::EnrichedBlend);
    assert!(corners.projected >= 7.0, "projected {}", corners.projected);
}

#[test]
fn corner_burst_between_captures_is_accelerating() {
    let early = corners_snapshot(20, 2, 1);
    let late = corners_snapshot(35, 5, 3);
    let history = SnapshotHistory::from_snapshots([early, late.clone()]).unwrap();

    let report = LiveAnalyzer::default()
        .analyze("scenario-b", &late, &history)
        .expect("snapshot is valid");

    let trend = &report.trends[&TrackedStat::Corners].combined;
    assert_eq!(trend.trend, TrendDirection::Accelerating);
    assert_eq!(trend.snapshots_count, 2);
}

#[test]
fn confident_corner_trend_drives_a_weighted_blend() {
    let early = corners_snapshot(20, 2, 1);
    let late = corners_snapshot(35, 5, 3);
    let history = SnapshotHistory::from_snapshots([early, late.clone()]).unwrap();
    let cfg = AnalysisConfig::default();

    let report = LiveAnalyzer::default()
        .analyze("scenario-b-blend", &late, &history)
        .expect("snapshot is valid");

    let trend = &report.trends[&TrackedStat::Corners].combined;
    assert!(trend.confidence > cfg.projection.trend_min_confidence, "{}", trend.confidence);

    let corners = report.market(Market::Corners).expect("corners market");
    assert_eq!(corners.method, ProjectionMethod::TrendBlend);

    let current = 8.0;
    let naive = current + per_minute(current, 35.0, cfg.historical.per90(Market::Corners)) * 55.0;
    let enriched = report.enriched.projections.for_market(Market::Corners);
    let expected = (0.5 * trend.projected_total_with_trend + 0.3 * enriched + 0.2 * naive).max(current);
    assert!(
        (corners.projected - expected).abs() < 1e-9,
        "projected {} expected {expected}",
        corners.projected
    );
}

#[test]
fn decided_btts_pins_score_weight_and_discounts_no() {
    let snap = MatchSnapshot {
        minute: 62,
        home_score: 2,
        away_score: 3,
        home: SideStats {
            possession: 51.0,
            total_shots: 9,
            shots_on_target: 4,
            corners: 4,
            fouls: 8,
            passes: 300,
            ..SideStats::default()
        },
        away: SideStats {
            possession: 49.0,
            total_shots: 10,
            shots_on_target: 5,
            corners: 3,
            fouls: 9,
            passes: 290,
            ..SideStats::default()
        },
    };
    let report = LiveAnalyzer::default()
        .analyze("scenario-c", &snap, &SnapshotHistory::new())
        .expect("snapshot is valid");

    let btts_weights = report.weights.family(MarketFamily::Btts).unwrap();
    assert!((btts_weights.get(WeightFactor::CurrentScore) - 0.60).abs() < 1e-9);

    let btts = report.outcome(Market::Btts).unwrap();
    let confidence = |selection| {
        btts.predictions
            .iter()
            .find(|p| p.selection == selection)
            .map(|p| p.confidence)
            .unwrap()
    };
    assert!(confidence(OutcomeSelection::BttsNo) < confidence(OutcomeSelection::BttsYes));
}

#[test]
fn quiet_opening_minutes_raise_no_anomalies() {
    let snap = MatchSnapshot {
        minute: 10,
        ..MatchSnapshot::default()
    };
    let report = anomaly::detect(&snap, &AnomalyConfig::default());
    assert!(report.anomalies.is_empty());
    assert_eq!(report.overall_severity, Severity::Ok);

    let full = LiveAnalyzer::default()
        .analyze("scenario-d", &snap, &SnapshotHistory::new())
        .expect("an empty early snapshot is still valid");
    assert!(full.anomalies.anomalies.is_empty());
}
