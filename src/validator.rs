use serde::{Deserialize, Serialize};

use crate::config::ValidatorConfig;
use crate::snapshot::{MatchSnapshot, SideStats};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Ok,
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub severity: Severity,
}

/// Check a snapshot for internal consistency. Callers must not run the
/// rest of the pipeline when `valid` is false.
pub fn validate(snapshot: &MatchSnapshot, cfg: &ValidatorConfig) -> ValidationReport {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    check_minute(snapshot, cfg, &mut errors, &mut warnings);
    for (label, side) in sides(snapshot) {
        check_shots(label, side, cfg, &mut errors, &mut warnings);
    }
    check_possession(snapshot, cfg, &mut errors, &mut warnings);
    for (label, side) in sides(snapshot) {
        check_discipline(label, side, cfg, &mut errors, &mut warnings);
        check_counter_ceilings(label, side, cfg, &mut errors);
    }
    check_goals_vs_target(snapshot, &mut warnings);
    check_stale_zero(snapshot, cfg, &mut errors);
    check_early_rates(snapshot, cfg, &mut warnings);

    let severity = if !errors.is_empty() {
        Severity::Critical
    } else {
        match warnings.len() {
            0 => Severity::Ok,
            1 => Severity::Low,
            2 | 3 => Severity::Medium,
            _ => Severity::High,
        }
    };

    ValidationReport {
        valid: errors.is_empty(),
        errors,
        warnings,
        severity,
    }
}

fn sides(snapshot: &MatchSnapshot) -> [(&'static str, &SideStats); 2] {
    [("home", &snapshot.home), ("away", &snapshot.away)]
}

fn check_minute(
    snapshot: &MatchSnapshot,
    cfg: &ValidatorConfig,
    errors: &mut Vec<String>,
    warnings: &mut Vec<String>,
) {
    if snapshot.minute > cfg.max_minute {
        errors.push(format!(
            "minute {} is outside 0-{}",
            snapshot.minute, cfg.max_minute
        ));
    } else if snapshot.minute > cfg.extra_time_minute {
        warnings.push(format!("minute {} suggests extra time", snapshot.minute));
    }
}

fn check_shots(
    label: &str,
    side: &SideStats,
    cfg: &ValidatorConfig,
    errors: &mut Vec<String>,
    warnings: &mut Vec<String>,
) {
    if side.shots_on_target <= side.total_shots {
        return;
    }
    let excess = side.shots_on_target - side.total_shots;
    let msg = format!(
        "{label} shots on target ({}) exceed total shots ({})",
        side.shots_on_target, side.total_shots
    );
    if excess > cfg.shots_tolerance {
        errors.push(msg);
    } else {
        warnings.push(msg);
    }
}

fn check_possession(
    snapshot: &MatchSnapshot,
    cfg: &ValidatorConfig,
    errors: &mut Vec<String>,
    warnings: &mut Vec<String>,
) {
    let home = snapshot.home.possession;
    let away = snapshot.away.possession;
    if !home.is_finite() || !away.is_finite() || home < 0.0 || away < 0.0 {
        errors.push(format!("possession values {home}/{away} are not valid percentages"));
        return;
    }
    if home == 0.0 && away == 0.0 {
        warnings.push("possession not reported".to_string());
        return;
    }
    let sum = home + away;
    let (hard_lo, hard_hi) = cfg.possession_hard;
    let (soft_lo, soft_hi) = cfg.possession_soft;
    if sum < hard_lo || sum > hard_hi {
        errors.push(format!("possession sums to {sum:.1}%"));
    } else if sum < soft_lo || sum > soft_hi {
        warnings.push(format!("possession sums to {sum:.1}%"));
    }
}

fn check_discipline(
    label: &str,
    side: &SideStats,
    cfg: &ValidatorConfig,
    errors: &mut Vec<String>,
    warnings: &mut Vec<String>,
) {
    if side.yellow_cards > side.fouls {
        let excess = side.yellow_cards - side.fouls;
        let msg = format!(
            "{label} yellow cards ({}) exceed fouls ({})",
            side.yellow_cards, side.fouls
        );
        if excess > cfg.cards_tolerance {
            errors.push(msg);
        } else {
            warnings.push(msg);
        }
    }
    if side.red_cards >= cfg.abandoned_red_cards {
        errors.push(format!(
            "{label} shows {} red cards; match cannot continue",
            side.red_cards
        ));
    }
}

fn check_counter_ceilings(label: &str, side: &SideStats, cfg: &ValidatorConfig, errors: &mut Vec<String>) {
    let counters = [
        ("shots", side.total_shots, cfg.max_side_events),
        ("shots on target", side.shots_on_target, cfg.max_side_events),
        ("corners", side.corners, cfg.max_side_events),
        ("fouls", side.fouls, cfg.max_side_events),
        ("cards", side.cards(), cfg.max_side_events),
        ("throw-ins", side.throw_ins, cfg.max_side_events),
        ("offsides", side.offsides, cfg.max_side_events),
        ("passes", side.passes, cfg.max_side_passes),
    ];
    for (name, count, max) in counters {
        if count > max {
            errors.push(format!("{label} {name} count {count} is not a plausible match total"));
        }
    }
}

fn check_goals_vs_target(snapshot: &MatchSnapshot, warnings: &mut Vec<String>) {
    // Own goals make this possible, so it only warns.
    for (label, goals, side) in [
        ("home", snapshot.home_score, &snapshot.home),
        ("away", snapshot.away_score, &snapshot.away),
    ] {
        if goals as u32 > side.shots_on_target && side.total_shots > 0 {
            warnings.push(format!(
                "{label} goals ({goals}) exceed shots on target ({})",
                side.shots_on_target
            ));
        }
    }
}

fn check_stale_zero(snapshot: &MatchSnapshot, cfg: &ValidatorConfig, errors: &mut Vec<String>) {
    if snapshot.minute <= cfg.stale_zero_minute {
        return;
    }
    let key_stats = snapshot.total(|s| {
        [s.total_shots, s.corners, s.fouls, s.passes, s.throw_ins, s.goal_kicks]
            .into_iter()
            .fold(0, u32::max)
    });
    let possession = snapshot.home.possession + snapshot.away.possession;
    if key_stats == 0 && possession == 0.0 && snapshot.total_goals() == 0 {
        errors.push(format!(
            "all key statistics are zero at minute {}; upstream parsing likely failed",
            snapshot.minute
        ));
    }
}

fn check_early_rates(snapshot: &MatchSnapshot, cfg: &ValidatorConfig, warnings: &mut Vec<String>) {
    if snapshot.minute >= cfg.early_rate_minute {
        return;
    }
    if snapshot.minute == 0 {
        let any = snapshot.total(|s| s.total_shots.max(s.corners).max(s.fouls)) > 0;
        if any {
            warnings.push("events recorded at minute 0".to_string());
        }
        return;
    }
    let minute = snapshot.minute as f64;
    let checks = [
        ("corner", snapshot.total(|s| s.corners), cfg.max_early_corner_rate),
        ("foul", snapshot.total(|s| s.fouls), cfg.max_early_foul_rate),
        ("shot", snapshot.total(|s| s.total_shots), cfg.max_early_shot_rate),
    ];
    for (name, count, max_rate) in checks {
        let rate = count as f64 / minute;
        if rate > max_rate {
            warnings.push(format!(
                "{name} rate {rate:.2}/min at minute {} is implausibly high",
                snapshot.minute
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> MatchSnapshot {
        MatchSnapshot {
            minute: 50,
            home_score: 1,
            away_score: 0,
            home: SideStats {
                possession: 52.0,
                total_shots: 9,
                shots_on_target: 4,
                corners: 4,
                fouls: 8,
                yellow_cards: 1,
                passes: 240,
                ..SideStats::default()
            },
            away: SideStats {
                possession: 48.0,
                total_shots: 6,
                shots_on_target: 2,
                corners: 3,
                fouls: 10,
                yellow_cards: 2,
                passes: 210,
                ..SideStats::default()
            },
        }
    }

    #[test]
    fn clean_snapshot_is_valid() {
        let report = validate(&base(), &ValidatorConfig::default());
        assert!(report.valid);
        assert!(report.errors.is_empty());
        assert_eq!(report.severity, Severity::Ok);
    }

    #[test]
    fn shots_on_target_excess_of_two_is_hard_error() {
        let mut snap = base();
        snap.home.shots_on_target = snap.home.total_shots + 2;
        let report = validate(&snap, &ValidatorConfig::default());
        assert!(!report.valid);
        assert_eq!(report.severity, Severity::Critical);
    }

    #[test]
    fn shots_on_target_excess_of_one_only_warns() {
        let mut snap = base();
        snap.away.shots_on_target = snap.away.total_shots + 1;
        let report = validate(&snap, &ValidatorConfig::default());
        assert!(report.valid);
        assert_eq!(report.warnings.len(), 1);
    }

    #[test]
    fn possession_bands() {
        let cfg = ValidatorConfig::default();
        for (home, away, valid, warns) in [
            (50.0, 50.0, true, false),
            (52.0, 53.0, true, false),
            (47.0, 47.5, true, true),
            (40.0, 45.0, false, false),
            (60.0, 55.0, false, false),
        ] {
            let mut snap = base();
            snap.home.possession = home;
            snap.away.possession = away;
            let report = validate(&snap, &cfg);
            assert_eq!(report.valid, valid, "{home}/{away}");
            let possession_warn = report.warnings.iter().any(|w| w.contains("possession"));
            assert_eq!(possession_warn, warns, "{home}/{away}");
        }
    }

    #[test]
    fn yellow_cards_above_fouls_is_error() {
        let mut snap = base();
        snap.home.fouls = 1;
        snap.home.yellow_cards = 3;
        assert!(!validate(&snap, &ValidatorConfig::default()).valid);
    }

    #[test]
    fn all_zero_after_half_hour_signals_parse_failure() {
        let snap = MatchSnapshot {
            minute: 40,
            ..MatchSnapshot::default()
        };
        let report = validate(&snap, &ValidatorConfig::default());
        assert!(!report.valid);
        assert!(report.errors.iter().any(|e| e.contains("parsing")));
    }

    #[test]
    fn early_corner_flood_warns() {
        let mut snap = base();
        snap.minute = 10;
        snap.home.corners = 5;
        snap.away.corners = 2;
        let report = validate(&snap, &ValidatorConfig::default());
        assert!(report.valid);
        assert!(report.warnings.iter().any(|w| w.starts_with("corner rate")));
    }

    #[test]
    fn extra_time_minute_warns_and_overflow_errors() {
        let cfg = ValidatorConfig::default();
        let mut snap = base();
        snap.minute = 100;
        assert!(validate(&snap, &cfg).valid);
        snap.minute = 121;
        assert!(!validate(&snap, &cfg).valid);
    }

    #[test]
    fn saturated_counters_are_rejected_not_overflowed() {
        let cfg = ValidatorConfig::default();
        let mut snap = base();
        snap.home.corners = u32::MAX;
        snap.away.corners = u32::MAX;
        let report = validate(&snap, &cfg);
        assert!(!report.valid);
        assert!(report.errors.iter().any(|e| e.contains("corners count")));

        let mut kickoff = MatchSnapshot::default();
        kickoff.home.total_shots = u32::MAX;
        kickoff.away.fouls = u32::MAX;
        kickoff.home.yellow_cards = u32::MAX;
        kickoff.home.red_cards = 1;
        let report = validate(&kickoff, &cfg);
        assert!(!report.valid);
        assert!(report.warnings.iter().any(|w| w.contains("minute 0")));
    }
}
