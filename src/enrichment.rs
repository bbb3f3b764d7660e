//! Derived-metric enrichment of a raw snapshot.
//!
//! Pure transform. Every ratio and rate goes through [`ratio`] or
//! [`per_minute`], which substitute a fallback constant instead of letting a
//! zero denominator or a non-finite value through.

use serde::{Deserialize, Serialize};

use crate::config::{EnrichmentConfig, HistoricalAverages};
use crate::snapshot::{Market, MatchSnapshot, SideStats};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SidePair {
    pub home: f64,
    pub away: f64,
}

impl SidePair {
    pub fn new(home: f64, away: f64) -> Self {
        Self { home, away }
    }

    fn from_sides(s: &MatchSnapshot, f: impl Fn(&SideStats, &SideStats) -> f64) -> Self {
        Self {
            home: f(&s.home, &s.away),
            away: f(&s.away, &s.home),
        }
    }

    pub fn total(&self) -> f64 {
        self.home + self.away
    }

    pub fn is_finite(&self) -> bool {
        self.home.is_finite() && self.away.is_finite()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EfficiencyMetrics {
    pub shot_accuracy: SidePair,
    pub conversion_rate: SidePair,
    pub big_chance_conversion: SidePair,
    pub pass_accuracy: SidePair,
    pub long_ball_accuracy: SidePair,
    pub cross_accuracy: SidePair,
    pub dribble_success: SidePair,
    pub xg_per_shot: SidePair,
    /// Goals minus expected goals.
    pub finishing_delta: SidePair,
    pub save_rate: SidePair,
    pub box_shot_share: SidePair,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntensityMetrics {
    pub shots_per_minute: SidePair,
    pub shots_on_target_per_minute: SidePair,
    pub corners_per_minute: SidePair,
    pub fouls_per_minute: SidePair,
    pub cards_per_minute: SidePair,
    pub passes_per_minute: SidePair,
    pub dangerous_attacks_per_minute: SidePair,
    pub defensive_actions_per_minute: SidePair,
    pub throw_ins_per_minute: SidePair,
    pub offsides_per_minute: SidePair,
    /// Combined attacking tempo, 50 = historical average.
    pub offensive: f64,
    /// Combined physical/defensive tempo, 50 = historical average.
    pub defensive: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DominanceMetrics {
    pub possession: SidePair,
    pub shots: SidePair,
    pub shots_on_target: SidePair,
    pub corners: SidePair,
    pub dangerous_attacks: SidePair,
    pub aerial_duels: SidePair,
    pub territory: SidePair,
    /// Weighted composite on a 0-100 scale; the two sides sum to 100.
    pub overall: SidePair,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GamePhase {
    Opening,
    FirstHalfMid,
    FirstHalfLate,
    SecondHalfEarly,
    SecondHalfMid,
    Closing,
    Stoppage,
}

impl GamePhase {
    pub fn from_minute(minute: u16) -> Self {
        match minute {
            0..15 => GamePhase::Opening,
            15..30 => GamePhase::FirstHalfMid,
            30..45 => GamePhase::FirstHalfLate,
            45..60 => GamePhase::SecondHalfEarly,
            60..75 => GamePhase::SecondHalfMid,
            75..=90 => GamePhase::Closing,
            _ => GamePhase::Stoppage,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GameState {
    Balanced,
    Open,
    Defensive,
    HomeDominating,
    AwayDominating,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IntensityLevel {
    Low,
    Medium,
    High,
    VeryHigh,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchContext {
    pub phase: GamePhase,
    pub time_progress: f64,
    pub minutes_remaining: f64,
    pub score_diff: i32,
    pub total_goals: u32,
    pub momentum: SidePair,
    pub combined_danger: f64,
    pub game_state: GameState,
    pub intensity: IntensityLevel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Projections {
    pub goals: f64,
    pub home_goals: f64,
    pub away_goals: f64,
    pub corners: f64,
    pub fouls: f64,
    pub cards: f64,
    pub shots: f64,
    pub shots_on_target: f64,
    pub throw_ins: f64,
    pub offsides: f64,
}

impl Projections {
    pub fn for_market(&self, market: Market) -> f64 {
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
pub struct ConfidenceMetrics {
    pub data_quality: f64,
    pub sample_size: f64,
    pub consistency: f64,
    pub reliability: f64,
    pub signal_strength: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedMetrics {
    pub efficiency: EfficiencyMetrics,
    pub intensity: IntensityMetrics,
    pub dominance: DominanceMetrics,
    pub offensive_threat: SidePair,
    pub defensive_strength: SidePair,
    pub context: MatchContext,
    pub projections: Projections,
    pub confidence: ConfidenceMetrics,
}

pub fn enrich(
    snapshot: &MatchSnapshot,
    home_score: u8,
    away_score: u8,
    minute: u16,
    hist: &HistoricalAverages,
    cfg: &EnrichmentConfig,
) -> EnrichedMetrics {
    let m = minute as f64;

    let efficiency = efficiency_metrics(snapshot, home_score, away_score, cfg);
    let intensity = intensity_metrics(snapshot, m, hist);
    let dominance = dominance_metrics(snapshot, cfg);
    let offensive_threat = offensive_threat(snapshot, m, hist);
    let defensive_strength = defensive_strength(snapshot, &efficiency, offensive_threat);
    let context = match_context(
        minute,
        home_score,
        away_score,
        &dominance,
        &intensity,
        offensive_threat,
        cfg,
    );
    let projections = projections(snapshot, home_score, away_score, m, &context, hist, cfg);
    let confidence = confidence_metrics(snapshot, home_score, away_score, &context, &dominance);

    EnrichedMetrics {
        efficiency,
        intensity,
        dominance,
        offensive_threat,
        defensive_strength,
        context,
        projections,
        confidence,
    }
}

/// `num / den`, or `fallback` when the denominator is not positive or the
/// result is not finite.
pub fn ratio(num: f64, den: f64, fallback: f64) -> f64 {
    if den <= 0.0 || !den.is_finite() {
        return fallback;
    }
    finite_or(num / den, fallback)
}

/// Events per elapsed minute, falling back to the historical per-90 rate
/// when no time has elapsed.
pub fn per_minute(count: f64, minute: f64, per90_fallback: f64) -> f64 {
    ratio(count, minute, per90_fallback / 90.0)
}

pub fn finite_or(v: f64, fallback: f64) -> f64 {
    if v.is_finite() { v } else { fallback }
}

fn share(a: f64, b: f64) -> f64 {
    ratio(a, a + b, 0.5)
}

fn share_pair(a: f64, b: f64) -> SidePair {
    let home = share(a, b);
    SidePair::new(home, 1.0 - home)
}

fn saturate(value: f64, reference: f64) -> f64 {
    ratio(value, reference, 0.0).clamp(0.0, 1.0)
}

fn efficiency_metrics(
    s: &MatchSnapshot,
    home_score: u8,
    away_score: u8,
    cfg: &EnrichmentConfig,
) -> EfficiencyMetrics {
    let goals = SidePair::new(home_score as f64, away_score as f64);
    let pair = |f: &dyn Fn(&SideStats, &SideStats) -> f64| SidePair::from_sides(s, f);

    EfficiencyMetrics {
        shot_accuracy: pair(&|x, _| {
            ratio(x.shots_on_target as f64, x.total_shots as f64, cfg.shot_accuracy)
        }),
        conversion_rate: SidePair::new(
            ratio(goals.home, s.home.total_shots as f64, cfg.conversion_rate),
            ratio(goals.away, s.away.total_shots as f64, cfg.conversion_rate),
        ),
        big_chance_conversion: pair(&|x, _| {
            let scored = x.big_chances.saturating_sub(x.big_chances_missed) as f64;
            ratio(scored, x.big_chances as f64, cfg.big_chance_conversion)
        }),
        pass_accuracy: pair(&|x, _| {
            ratio(x.accurate_passes as f64, x.passes as f64, cfg.pass_accuracy)
        }),
        long_ball_accuracy: pair(&|x, _| {
            ratio(x.accurate_long_balls as f64, x.long_balls as f64, cfg.long_ball_accuracy)
        }),
        cross_accuracy: pair(&|x, _| {
            ratio(x.accurate_crosses as f64, x.crosses as f64, cfg.cross_accuracy)
        }),
        dribble_success: pair(&|x, _| {
            ratio(x.successful_dribbles as f64, x.dribbles as f64, cfg.dribble_success)
        }),
        xg_per_shot: pair(&|x, _| ratio(x.expected_goals, x.total_shots as f64, cfg.xg_per_shot)),
        finishing_delta: SidePair::new(
            finite_or(goals.home - s.home.expected_goals, 0.0),
            finite_or(goals.away - s.away.expected_goals, 0.0),
        ),
        save_rate: pair(&|x, opp| ratio(x.saves as f64, opp.shots_on_target as f64, cfg.save_rate)),
        box_shot_share: pair(&|x, _| {
            ratio(x.shots_inside_box as f64, x.total_shots as f64, cfg.box_shot_share)
        }),
    }
}

fn intensity_metrics(s: &MatchSnapshot, m: f64, hist: &HistoricalAverages) -> IntensityMetrics {
    let rate = |f: fn(&SideStats) -> u32, per90_side: f64| {
        SidePair::new(
            per_minute(f(&s.home) as f64, m, per90_side),
            per_minute(f(&s.away) as f64, m, per90_side),
        )
    };

    let shots = rate(|x| x.total_shots, hist.shots / 2.0);
    let corners = rate(|x| x.corners, hist.corners / 2.0);
    let fouls = rate(|x| x.fouls, hist.fouls / 2.0);
    let defensive_actions = rate(SideStats::defensive_actions, hist.side_defensive_actions);

    let shots_ratio = ratio(shots.total(), hist.shots / 90.0, 1.0);
    let corners_ratio = ratio(corners.total(), hist.corners / 90.0, 1.0);
    let fouls_ratio = ratio(fouls.total(), hist.fouls / 90.0, 1.0);
    let def_ratio = ratio(
        defensive_actions.total(),
        hist.side_defensive_actions * 2.0 / 90.0,
        1.0,
    );

    IntensityMetrics {
        shots_on_target_per_minute: rate(|x| x.shots_on_target, hist.shots_on_target / 2.0),
        cards_per_minute: rate(SideStats::cards, hist.cards / 2.0),
        passes_per_minute: rate(|x| x.passes, hist.side_passes),
        dangerous_attacks_per_minute: rate(|x| x.dangerous_attacks, hist.side_dangerous_attacks),
        throw_ins_per_minute: rate(|x| x.throw_ins, hist.throw_ins / 2.0),
        offsides_per_minute: rate(|x| x.offsides, hist.offsides / 2.0),
        offensive: (50.0 * (0.6 * shots_ratio + 0.4 * corners_ratio)).clamp(0.0, 100.0),
        defensive: (50.0 * (0.6 * fouls_ratio + 0.4 * def_ratio)).clamp(0.0, 100.0),
        shots_per_minute: shots,
        corners_per_minute: corners,
        fouls_per_minute: fouls,
        defensive_actions_per_minute: defensive_actions,
    }
}

fn dominance_metrics(s: &MatchSnapshot, cfg: &EnrichmentConfig) -> DominanceMetrics {
    let pair = |f: fn(&SideStats) -> f64| share_pair(f(&s.home), f(&s.away));

    let possession = pair(|x| x.possession);
    let shots = pair(|x| x.total_shots as f64);
    let shots_on_target = pair(|x| x.shots_on_target as f64);
    let corners = pair(|x| x.corners as f64);
    let dangerous_attacks = pair(|x| x.dangerous_attacks as f64);
    let aerial_duels = pair(|x| x.aerial_duels_won as f64);
    let territory = pair(|x| x.touches_in_box as f64 + x.final_third_entries as f64);

    let w = &cfg.dominance_weights;
    let weight_sum = w.possession
        + w.shots
        + w.shots_on_target
        + w.corners
        + w.dangerous_attacks
        + w.aerial_duels;
    let composite = w.possession * possession.home
        + w.shots * shots.home
        + w.shots_on_target * shots_on_target.home
        + w.corners * corners.home
        + w.dangerous_attacks * dangerous_attacks.home
        + w.aerial_duels * aerial_duels.home;
    let home = (100.0 * ratio(composite, weight_sum, 0.5)).clamp(0.0, 100.0);

    DominanceMetrics {
        possession,
        shots,
        shots_on_target,
        corners,
        dangerous_attacks,
        aerial_duels,
        territory,
        overall: SidePair::new(home, 100.0 - home),
    }
}

fn offensive_threat(s: &MatchSnapshot, m: f64, hist: &HistoricalAverages) -> SidePair {
    // Reference rates sit at twice the per-side average, so an average side scores 50.
    let sot_ref = hist.shots_on_target / 90.0;
    let xg_ref = hist.side_expected_goals * 2.0 / 90.0;
    let da_ref = hist.side_dangerous_attacks * 2.0 / 90.0;
    let corner_ref = hist.corners / 90.0;
    let box_ref = hist.side_touches_in_box * 2.0 / 90.0;

    let threat = |x: &SideStats| {
        let sot = per_minute(x.shots_on_target as f64, m, hist.shots_on_target / 2.0);
        let xg = per_minute(x.expected_goals, m, hist.side_expected_goals);
        let da = per_minute(x.dangerous_attacks as f64, m, hist.side_dangerous_attacks);
        let corners = per_minute(x.corners as f64, m, hist.corners / 2.0);
        let touches = per_minute(x.touches_in_box as f64, m, hist.side_touches_in_box);
        let score = 0.35 * saturate(sot, sot_ref)
            + 0.25 * saturate(xg, xg_ref)
            + 0.20 * saturate(da, da_ref)
            + 0.10 * saturate(corners, corner_ref)
            + 0.10 * saturate(touches, box_ref);
        finite_or(100.0 * score, 50.0).clamp(0.0, 100.0)
    };

    SidePair::new(threat(&s.home), threat(&s.away))
}

fn defensive_strength(s: &MatchSnapshot, eff: &EfficiencyMetrics, threat: SidePair) -> SidePair {
    let duels = share_pair(
        s.home.duels_won as f64 + s.home.ground_duels_won as f64,
        s.away.duels_won as f64 + s.away.ground_duels_won as f64,
    );
    let actions = share_pair(
        s.home.defensive_actions() as f64,
        s.away.defensive_actions() as f64,
    );
    let strength = |save_rate: f64, duel_share: f64, action_share: f64, opp_threat: f64| {
        let v = 50.0 + 20.0 * (save_rate - 0.7) / 0.3 + 30.0 * (duel_share - 0.5)
            + 30.0 * (action_share - 0.5)
            - 0.3 * (opp_threat - 50.0);
        finite_or(v, 50.0).clamp(0.0, 100.0)
    };
    SidePair::new(
        strength(eff.save_rate.home, duels.home, actions.home, threat.away),
        strength(eff.save_rate.away, duels.away, actions.away, threat.home),
    )
}

fn match_context(
    minute: u16,
    home_score: u8,
    away_score: u8,
    dominance: &DominanceMetrics,
    intensity: &IntensityMetrics,
    threat: SidePair,
    cfg: &EnrichmentConfig,
) -> MatchContext {
    let m = minute as f64;
    let score_diff = home_score as i32 - away_score as i32;
    let w = cfg.momentum_dominance_weight;
    let goal_term = |diff: i32| 50.0 + cfg.momentum_goal_step * diff as f64;
    let momentum = SidePair::new(
        (w * dominance.overall.home + (1.0 - w) * goal_term(score_diff)).clamp(0.0, 100.0),
        (w * dominance.overall.away + (1.0 - w) * goal_term(-score_diff)).clamp(0.0, 100.0),
    );

    let combined_danger = threat.total() / 2.0;
    let differential = dominance.overall.home - dominance.overall.away;
    let game_state = if differential > cfg.dominating_threshold {
        GameState::HomeDominating
    } else if differential < -cfg.dominating_threshold {
        GameState::AwayDominating
    } else if combined_danger >= cfg.open_danger {
        GameState::Open
    } else if combined_danger <= cfg.defensive_danger {
        GameState::Defensive
    } else {
        GameState::Balanced
    };

    let avg_intensity = (intensity.offensive + intensity.defensive) / 2.0;
    let [low, medium, high] = cfg.intensity_cutoffs;
    let intensity = if avg_intensity < low {
        IntensityLevel::Low
    } else if avg_intensity < medium {
        IntensityLevel::Medium
    } else if avg_intensity < high {
        IntensityLevel::High
    } else {
        IntensityLevel::VeryHigh
    };

    MatchContext {
        phase: GamePhase::from_minute(minute),
        time_progress: (m / 90.0).clamp(0.0, 1.0),
        minutes_remaining: (90.0 - m).max(0.0),
        score_diff,
        total_goals: home_score as u32 + away_score as u32,
        momentum,
        combined_danger,
        game_state,
        intensity,
    }
}

/// Extrapolate one count to full time. Early thin samples are pulled toward
/// the historical rate; the result never drops below the observed count.
fn extrapolate(current: f64, m: f64, per90: f64, multiplier: f64, cfg: &EnrichmentConfig) -> f64 {
    let remaining = (90.0 - m).max(0.0);
    let hist_rate = per90 / 90.0;
    let observed = per_minute(current, m, per90);
    let thin = cfg.thin_sample_minute as f64;
    let rate = if m < thin && observed < cfg.min_signal_floor * hist_rate {
        let w = (m / thin).clamp(0.0, 1.0);
        w * observed + (1.0 - w) * hist_rate
    } else {
        observed
    };
    let projected = current + rate * remaining * multiplier;
    finite_or(projected, current + hist_rate * remaining).max(current)
}

fn projections(
    s: &MatchSnapshot,
    home_score: u8,
    away_score: u8,
    m: f64,
    ctx: &MatchContext,
    hist: &HistoricalAverages,
    cfg: &EnrichmentConfig,
) -> Projections {
    let minute = m as u16;
    let close = ctx.score_diff.abs() <= 1;
    let level = ctx.score_diff == 0;
    let possession_gap = (s.home.possession - s.away.possession).abs();

    let mut corner_mult = 1.0;
    if possession_gap > cfg.corner_possession_gap {
        corner_mult *= cfg.corner_possession_boost;
    }
    if minute > cfg.corner_late_minute {
        corner_mult *= cfg.corner_late_boost;
    }
    if !level {
        corner_mult *= cfg.corner_score_boost;
    }

    let mut goal_mult = match ctx.game_state {
        GameState::Open => cfg.goals_open_boost,
        GameState::Defensive => cfg.goals_defensive_damp,
        _ => 1.0,
    };
    if minute > cfg.goals_chasing_minute && ctx.score_diff.abs() == 1 {
        goal_mult *= cfg.goals_chasing_boost;
    }

    let mut foul_mult = match ctx.intensity {
        IntensityLevel::High => cfg.fouls_high_boost,
        IntensityLevel::VeryHigh => cfg.fouls_very_high_boost,
        _ => 1.0,
    };
    if close && minute > cfg.cards_late_minute {
        foul_mult *= cfg.fouls_close_late_boost;
    }

    let mut card_mult = 1.0;
    if minute > cfg.cards_late_minute {
        card_mult *= cfg.cards_late_boost;
    }
    if close {
        card_mult *= cfg.cards_close_boost;
    }

    let shot_mult = if level { 1.0 } else { cfg.shots_chasing_boost };
    let offside_mult = match ctx.game_state {
        GameState::HomeDominating | GameState::AwayDominating => cfg.offsides_dominance_boost,
        _ => 1.0,
    };

    let count = |market: Market| s.market_count(market);
    let home_goals = extrapolate(home_score as f64, m, hist.goals / 2.0, goal_mult, cfg);
    let away_goals = extrapolate(away_score as f64, m, hist.goals / 2.0, goal_mult, cfg);

    Projections {
        goals: home_goals + away_goals,
        home_goals,
        away_goals,
        corners: extrapolate(count(Market::Corners), m, hist.corners, corner_mult, cfg),
        fouls: extrapolate(count(Market::Fouls), m, hist.fouls, foul_mult, cfg),
        cards: extrapolate(count(Market::Cards), m, hist.cards, card_mult, cfg),
        shots: extrapolate(count(Market::Shots), m, hist.shots, shot_mult, cfg),
        shots_on_target: extrapolate(
            count(Market::ShotsOnTarget),
            m,
            hist.shots_on_target,
            shot_mult,
            cfg,
        ),
        throw_ins: extrapolate(count(Market::ThrowIns), m, hist.throw_ins, 1.0, cfg),
        offsides: extrapolate(count(Market::Offsides), m, hist.offsides, offside_mult, cfg),
    }
}

fn confidence_metrics(
    s: &MatchSnapshot,
    home_score: u8,
    away_score: u8,
    ctx: &MatchContext,
    dominance: &DominanceMetrics,
) -> ConfidenceMetrics {
    let missing = |f: fn(&SideStats) -> f64| f(&s.home) + f(&s.away) <= 0.0;
    let mut data_quality: f64 = 100.0;
    if missing(|x| x.possession) {
        data_quality -= 15.0;
    }
    if missing(|x| x.passes as f64) {
        data_quality -= 10.0;
    }
    if missing(|x| x.expected_goals) {
        data_quality -= 10.0;
    }
    if missing(|x| x.dangerous_attacks as f64) {
        data_quality -= 10.0;
    }
    if missing(|x| x.duels_won as f64 + x.aerial_duels_won as f64) {
        data_quality -= 5.0;
    }
    let data_quality = data_quality.max(40.0);

    let sample_size = 20.0 + 80.0 * ctx.time_progress;

    let mut consistency: f64 = 100.0;
    for (side, goals) in [(&s.home, home_score), (&s.away, away_score)] {
        if side.shots_on_target > side.total_shots {
            consistency -= 15.0;
        }
        if goals as u32 > side.shots_on_target {
            consistency -= 10.0;
        }
    }
    let possession_sum = s.home.possession + s.away.possession;
    if possession_sum > 0.0 && !(95.0..=105.0).contains(&possession_sum) {
        consistency -= 10.0;
    }
    let consistency = consistency.max(0.0);

    let reliability = (data_quality + sample_size + consistency) / 3.0;
    let differential = (dominance.overall.home - dominance.overall.away).abs();
    let signal_strength = finite_or(differential + 0.5 * ctx.combined_danger, 0.0).clamp(0.0, 100.0);

    ConfidenceMetrics {
        data_quality,
        sample_size,
        consistency,
        reliability,
        signal_strength,
    }
}
