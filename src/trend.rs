//! Time-series trend of tracked statistics across the snapshot history.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::TrendConfig;
use crate::enrichment::{finite_or, ratio};
use crate::snapshot::{HistoryPoint, MatchSnapshot, SideStats};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Accelerating,
    Stable,
    Decelerating,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendResult {
    pub current_rate: f64,
    pub trend: TrendDirection,
    pub trend_factor: f64,
    pub projected_total: f64,
    pub projected_total_with_trend: f64,
    pub confidence: f64,
    pub snapshots_count: usize,
    pub r_squared: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackedStat {
    Corners,
    Fouls,
    Cards,
    Shots,
    ShotsOnTarget,
    Possession,
    Goals,
    ThrowIns,
    Offsides,
}

impl TrackedStat {
    pub const ALL: [TrackedStat; 9] = [
        TrackedStat::Corners,
        TrackedStat::Fouls,
        TrackedStat::Cards,
        TrackedStat::Shots,
        TrackedStat::ShotsOnTarget,
        TrackedStat::Possession,
        TrackedStat::Goals,
        TrackedStat::ThrowIns,
        TrackedStat::Offsides,
    ];

    fn side_value(self, side: &SideStats) -> f64 {
        match self {
            TrackedStat::Corners => side.corners as f64,
            TrackedStat::Fouls => side.fouls as f64,
            TrackedStat::Cards => side.cards() as f64,
            TrackedStat::Shots => side.total_shots as f64,
            TrackedStat::ShotsOnTarget => side.shots_on_target as f64,
            TrackedStat::Possession => side.possession,
            TrackedStat::ThrowIns => side.throw_ins as f64,
            TrackedStat::Offsides => side.offsides as f64,
            TrackedStat::Goals => 0.0,
        }
    }

    pub fn home(self, s: &MatchSnapshot) -> f64 {
        match self {
            TrackedStat::Goals => s.home_score as f64,
            _ => self.side_value(&s.home),
        }
    }

    pub fn away(self, s: &MatchSnapshot) -> f64 {
        match self {
            TrackedStat::Goals => s.away_score as f64,
            _ => self.side_value(&s.away),
        }
    }

    /// Combined value. For possession this is the home-minus-away gap, since
    /// the sum is pinned near 100.
    pub fn combined(self, s: &MatchSnapshot) -> f64 {
        match self {
            TrackedStat::Possession => self.home(s) - self.away(s),
            _ => self.home(s) + self.away(s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatTrends {
    pub home: TrendResult,
    pub away: TrendResult,
    pub combined: TrendResult,
}

pub type TrendReport = BTreeMap<TrackedStat, StatTrends>;

/// Trend every tracked statistic, per side and combined.
pub fn analyze_all(history: &[HistoryPoint], current_minute: u16, cfg: &TrendConfig) -> TrendReport {
    TrackedStat::ALL
        .into_iter()
        .map(|stat| {
            let trends = StatTrends {
                home: analyze(history, |s| stat.home(s), current_minute, cfg),
                away: analyze(history, |s| stat.away(s), current_minute, cfg),
                combined: analyze(history, |s| stat.combined(s), current_minute, cfg),
            };
            (stat, trends)
        })
        .collect()
}

pub fn analyze(
    history: &[HistoryPoint],
    extract: impl Fn(&MatchSnapshot) -> f64,
    current_minute: u16,
    cfg: &TrendConfig,
) -> TrendResult {
    let series: Vec<(f64, f64)> = history
        .iter()
        .map(|p| (p.minute as f64, finite_or(extract(&p.snapshot), 0.0)))
        .collect();
    let minute = current_minute as f64;

    if series.len() < 2 {
        return single_rate(series.last().copied(), minute, cfg);
    }

    let Some(fit) = linear_fit(&series) else {
        // Every point shares one minute; nothing to regress against.
        return single_rate(series.last().copied(), minute, cfg);
    };

    let projected_total = finite_or(fit.intercept + fit.slope * 90.0, 0.0);
    let trend_factor = trend_factor(&series);
    let trend = classify(trend_factor, cfg.trend_cutoff);

    let remaining = (90.0 - minute).max(0.0);
    let cap = cfg.max_trend_adjustment * projected_total.abs();
    let adjustment = (trend_factor * fit.slope * remaining).clamp(-cap, cap);
    let projected_total_with_trend = finite_or(projected_total + adjustment, projected_total).max(0.0);

    let count_term = (series.len().min(cfg.snapshot_cap) as f64) / cfg.snapshot_cap.max(1) as f64;
    let time_term = (minute.min(cfg.minute_cap)) / cfg.minute_cap;
    let confidence = 100.0
        * (cfg.count_weight * count_term
            + cfg.fit_weight * fit.r_squared
            + cfg.time_weight * finite_or(time_term, 0.0));

    TrendResult {
        current_rate: fit.slope,
        trend,
        trend_factor,
        projected_total,
        projected_total_with_trend,
        confidence: confidence.clamp(0.0, 100.0),
        snapshots_count: series.len(),
        r_squared: fit.r_squared,
    }
}

fn single_rate(last: Option<(f64, f64)>, minute: f64, cfg: &TrendConfig) -> TrendResult {
    let (point_minute, value) = last.unwrap_or((minute, 0.0));
    let elapsed = point_minute.max(minute);
    let rate = ratio(value, elapsed, 0.0);
    let projected = (rate * 90.0).max(value);
    TrendResult {
        current_rate: rate,
        trend: TrendDirection::Stable,
        trend_factor: 0.0,
        projected_total: projected,
        projected_total_with_trend: projected,
        confidence: cfg.single_point_confidence,
        snapshots_count: usize::from(last.is_some()),
        r_squared: 0.0,
    }
}

struct LinearFit {
    slope: f64,
    intercept: f64,
    r_squared: f64,
}

/// Ordinary least squares of value against minute. `None` when the minutes
/// have no spread.
fn linear_fit(series: &[(f64, f64)]) -> Option<LinearFit> {
    let n = series.len() as f64;
    let mean_x = series.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_y = series.iter().map(|(_, y)| y).sum::<f64>() / n;

    let mut sxx = 0.0;
    let mut sxy = 0.0;
    for (x, y) in series {
        sxx += (x - mean_x).powi(2);
        sxy += (x - mean_x) * (y - mean_y);
    }
    if sxx <= f64::EPSILON {
        return None;
    }
    let slope = sxy / sxx;
    let intercept = mean_y - slope * mean_x;

    let mut ss_res = 0.0;
    let mut ss_tot = 0.0;
    for (x, y) in series {
        ss_res += (y - (intercept + slope * x)).powi(2);
        ss_tot += (y - mean_y).powi(2);
    }
    // A flat series is fitted exactly by a flat line.
    let r_squared = if ss_tot <= f64::EPSILON {
        1.0
    } else {
        finite_or(1.0 - ss_res / ss_tot, 0.0).clamp(0.0, 1.0)
    };

    Some(LinearFit {
        slope: finite_or(slope, 0.0),
        intercept: finite_or(intercept, 0.0),
        r_squared,
    })
}

/// Compare the rate over the first half of the window with the rate over
/// the second half. With a single leading point the first-half rate is the
/// average pace since kickoff.
fn trend_factor(series: &[(f64, f64)]) -> f64 {
    let first = series[0];
    let last = series[series.len() - 1];
    if series.iter().all(|(_, y)| *y == first.1) {
        return 0.0;
    }
    let mid = series[(series.len() - 1) / 2];

    let early_rate = if mid.0 > first.0 {
        ratio(mid.1 - first.1, mid.0 - first.0, 0.0)
    } else {
        ratio(first.1, first.0, 0.0)
    };
    let late_rate = ratio(last.1 - mid.1, last.0 - mid.0, early_rate);

    let factor = if early_rate.abs() <= f64::EPSILON {
        if late_rate > 0.0 {
            1.0
        } else if late_rate < 0.0 {
            -1.0
        } else {
            0.0
        }
    } else {
        (late_rate - early_rate) / early_rate.abs()
    };
    finite_or(factor, 0.0).clamp(-1.0, 1.0)
}

fn classify(factor: f64, cutoff: f64) -> TrendDirection {
    if factor > cutoff {
        TrendDirection::Accelerating
    } else if factor < -cutoff {
        TrendDirection::Decelerating
    } else {
        TrendDirection::Stable
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::SnapshotHistory;

    fn corners_at(points: &[(u16, u32)]) -> SnapshotHistory {
        SnapshotHistory::from_snapshots(points.iter().map(|(minute, corners)| MatchSnapshot {
            minute: *minute,
            home: SideStats {
                corners: *corners,
                ..SideStats::default()
            },
            ..MatchSnapshot::default()
        }))
        .unwrap()
    }

    fn corners(history: &SnapshotHistory, minute: u16) -> TrendResult {
        analyze(
            history.points(),
            |s| s.home.corners as f64,
            minute,
            &TrendConfig::default(),
        )
    }

    #[test]
    fn single_point_is_low_confidence_rate_projection() {
        let h = corners_at(&[(30, 4)]);
        let t = corners(&h, 30);
        assert_eq!(t.confidence, 50.0);
        assert_eq!(t.trend, TrendDirection::Stable);
        assert!((t.projected_total - 12.0).abs() < 1e-9);
    }

    #[test]
    fn identical_values_are_stable() {
        let h = corners_at(&[(20, 5), (35, 5)]);
        let t = corners(&h, 35);
        assert_eq!(t.trend, TrendDirection::Stable);
        assert_eq!(t.trend_factor, 0.0);
        assert!((0.0..=1.0).contains(&t.r_squared));
    }

    #[test]
    fn faster_second_window_is_accelerating() {
        let h = corners_at(&[(20, 3), (35, 8)]);
        let t = corners(&h, 35);
        assert_eq!(t.trend, TrendDirection::Accelerating);
        assert!(t.trend_factor > 0.15);
    }

    #[test]
    fn slower_second_window_is_decelerating() {
        let h = corners_at(&[(10, 1), (20, 5), (30, 9), (40, 10), (50, 10)]);
        let t = corners(&h, 50);
        assert_eq!(t.trend, TrendDirection::Decelerating);
        assert!(t.projected_total_with_trend <= t.projected_total);
    }

    #[test]
    fn trend_adjustment_is_capped_at_thirty_percent() {
        let h = corners_at(&[(5, 0), (10, 0), (15, 1), (20, 6)]);
        let t = corners(&h, 20);
        assert!(t.projected_total_with_trend <= t.projected_total * 1.3 + 1e-9);
        assert!(t.projected_total_with_trend >= 0.0);
    }

    #[test]
    fn r_squared_stays_in_unit_interval_for_noisy_series() {
        let h = corners_at(&[(10, 2), (20, 2), (30, 7), (40, 7), (50, 8)]);
        let t = corners(&h, 50);
        assert!((0.0..=1.0).contains(&t.r_squared));
        assert!(t.confidence <= 100.0);
    }

    #[test]
    fn analyze_all_covers_every_tracked_stat() {
        let h = corners_at(&[(20, 3), (35, 8)]);
        let report = analyze_all(h.points(), 35, &TrendConfig::default());
        assert_eq!(report.len(), TrackedStat::ALL.len());
        assert_eq!(
            report[&TrackedStat::Corners].combined.trend,
            TrendDirection::Accelerating
        );
    }
}
