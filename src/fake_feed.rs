//! Deterministic synthetic matches for tests, benchmarks and the demo binary.

use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;
use crate::snapshot::{MatchSnapshot, SideStats, SnapshotHistory};

const KICKOFF_TS: i64 = 1_781_546_400;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationParams {
    pub until_minute: u16,
    /// Minutes between captures written to the history.
    pub capture_every: u16,
    pub home_strength: f64,
    pub away_strength: f64,
    /// Scales fouls and cards.
    pub physicality: f64,
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self {
            until_minute: 90,
            capture_every: 5,
            home_strength: 1.1,
            away_strength: 0.9,
            physicality: 1.0,
        }
    }
}

struct SideState {
    stats: SideStats,
    goals: u8,
    // Passes completed by this side, drives possession.
    touches: f64,
}

impl SideState {
    fn new() -> Self {
        Self {
            stats: SideStats::default(),
            goals: 0,
            touches: 0.0,
        }
    }
}

/// Play a match minute by minute from `seed`. The same seed always yields
/// the same history.
pub fn simulate_match(seed: u64, params: &SimulationParams) -> Result<SnapshotHistory, AnalysisError> {
    let mut rng = StdRng::seed_from_u64(seed);
    let kickoff = DateTime::<Utc>::from_timestamp(KICKOFF_TS, 0).unwrap_or_default();
    let every = params.capture_every.max(1);

    let mut home = SideState::new();
    let mut away = SideState::new();
    let mut history = SnapshotHistory::new();

    for minute in 1..=params.until_minute {
        play_minute(&mut rng, &mut home, params.home_strength, params.physicality);
        play_minute(&mut rng, &mut away, params.away_strength, params.physicality);

        if minute % every == 0 || minute == params.until_minute {
            let snapshot = capture(minute, &home, &away);
            history.push(snapshot, kickoff + Duration::minutes(minute as i64))?;
        }
    }
    Ok(history)
}

fn play_minute(rng: &mut StdRng, side: &mut SideState, strength: f64, physicality: f64) {
    let s = &mut side.stats;
    let strength = strength.clamp(0.2, 3.0);
    let physicality = physicality.clamp(0.2, 3.0);

    let passes = rng.gen_range(3..8) as f64 * strength;
    let passes = passes.round() as u32;
    s.passes += passes;
    s.accurate_passes += (passes as f64 * rng.gen_range(0.70..0.90)).round() as u32;
    side.touches += passes as f64;
    if rng.gen_bool(0.25) {
        s.long_balls += 1;
        if rng.gen_bool(0.5) {
            s.accurate_long_balls += 1;
        }
    }

    if rng.gen_bool((0.9 * strength).min(1.0)) {
        s.attacks += 1;
        if rng.gen_bool(0.5) {
            s.dangerous_attacks += 1;
            s.final_third_entries += 1;
            if rng.gen_bool(0.5) {
                s.touches_in_box += 1;
            }
        }
    }

    if rng.gen_bool((0.135 * strength).min(1.0)) {
        s.total_shots += 1;
        let inside = rng.gen_bool(0.6);
        if inside {
            s.shots_inside_box += 1;
        } else {
            s.shots_outside_box += 1;
        }
        s.expected_goals += if inside { 0.14 } else { 0.04 };
        if rng.gen_bool(0.35) {
            s.shots_on_target += 1;
            if rng.gen_bool(0.3) {
                side.goals = side.goals.saturating_add(1);
            }
        } else if rng.gen_bool(0.3) {
            s.blocked_shots += 1;
        } else {
            s.shots_off_target += 1;
            if rng.gen_bool(0.05) {
                s.hit_woodwork += 1;
            }
        }
    }

    if rng.gen_bool((0.055 * strength).min(1.0)) {
        s.corners += 1;
    }
    s.offsides += u32::from(rng.gen_bool(0.022));
    if rng.gen_bool(0.22) {
        s.crosses += 1;
        if rng.gen_bool(0.25) {
            s.accurate_crosses += 1;
        }
    }
    if rng.gen_bool((0.128 * physicality).min(1.0)) {
        s.fouls += 1;
        s.free_kicks += 1;
        if rng.gen_bool(0.17) {
            s.yellow_cards += 1;
        } else if s.red_cards == 0 && rng.gen_bool(0.01) {
            s.red_cards += 1;
        }
    }
    if rng.gen_bool(0.233) {
        s.throw_ins += 1;
    }
    if rng.gen_bool(0.09) {
        s.goal_kicks += 1;
    }
    if rng.gen_bool(0.3) {
        s.dribbles += 1;
        if rng.gen_bool(0.5) {
            s.successful_dribbles += 1;
        }
    }

    s.tackles += u32::from(rng.gen_bool(0.18));
    s.interceptions += u32::from(rng.gen_bool(0.1));
    s.clearances += u32::from(rng.gen_bool(0.22));
    s.recoveries += u32::from(rng.gen_bool(0.5));
    let aerial = rng.gen_bool(0.15);
    s.aerial_duels_won += u32::from(aerial);
    let ground = rng.gen_bool(0.3);
    s.ground_duels_won += u32::from(ground);
    s.duels_won += u32::from(aerial) + u32::from(ground);
}

fn capture(minute: u16, home: &SideState, away: &SideState) -> MatchSnapshot {
    let total = home.touches + away.touches;
    let home_possession = if total > 0.0 {
        (home.touches / total * 1000.0).round() / 10.0
    } else {
        50.0
    };

    let mut home_stats = home.stats.clone();
    let mut away_stats = away.stats.clone();
    home_stats.possession = home_possession;
    away_stats.possession = 100.0 - home_possession;
    // A keeper save is every shot on target the other side did not score.
    home_stats.saves = away_stats.shots_on_target.saturating_sub(away.goals as u32);
    away_stats.saves = home_stats.shots_on_target.saturating_sub(home.goals as u32);
    home_stats.big_chances = home_stats.shots_inside_box / 3;
    away_stats.big_chances = away_stats.shots_inside_box / 3;
    home_stats.big_chances_missed = home_stats.big_chances.saturating_sub(home.goals as u32);
    away_stats.big_chances_missed = away_stats.big_chances.saturating_sub(away.goals as u32);

    MatchSnapshot {
        minute,
        home_score: home.goals,
        away_score: away.goals,
        home: home_stats,
        away: away_stats,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ValidatorConfig;
    use crate::validator::validate;

    #[test]
    fn same_seed_same_match() {
        let params = SimulationParams::default();
        let a = simulate_match(7, &params).unwrap();
        let b = simulate_match(7, &params).unwrap();
        assert_eq!(a.latest(), b.latest());
        assert_eq!(a.len(), 18);
    }

    #[test]
    fn simulated_snapshots_pass_validation() {
        let cfg = ValidatorConfig::default();
        for seed in 0..20 {
            let history = simulate_match(seed, &SimulationParams::default()).unwrap();
            for point in history.points() {
                let report = validate(&point.snapshot, &cfg);
                assert!(report.valid, "seed {seed} minute {}: {:?}", point.minute, report.errors);
            }
        }
    }

    #[test]
    fn counters_never_decrease() {
        let history = simulate_match(3, &SimulationParams::default()).unwrap();
        for pair in history.points().windows(2) {
            let (a, b) = (&pair[0].snapshot, &pair[1].snapshot);
            assert!(b.total(|s| s.corners) >= a.total(|s| s.corners));
            assert!(b.total(|s| s.fouls) >= a.total(|s| s.fouls));
            assert!(b.total_goals() >= a.total_goals());
            assert!(pair[1].captured_at > pair[0].captured_at);
        }
    }
}
