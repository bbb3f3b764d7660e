use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;

/// Raw counting statistics for one side, as handed over by the stats parser.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SideStats {
    pub possession: f64,
    pub expected_goals: f64,

    pub total_shots: u32,
    pub shots_on_target: u32,
    pub shots_off_target: u32,
    pub blocked_shots: u32,
    pub shots_inside_box: u32,
    pub shots_outside_box: u32,
    pub big_chances: u32,
    pub big_chances_missed: u32,
    pub hit_woodwork: u32,

    pub corners: u32,
    pub offsides: u32,
    pub fouls: u32,
    pub yellow_cards: u32,
    pub red_cards: u32,
    pub free_kicks: u32,
    pub throw_ins: u32,
    pub goal_kicks: u32,

    pub passes: u32,
    pub accurate_passes: u32,
    pub long_balls: u32,
    pub accurate_long_balls: u32,
    pub crosses: u32,
    pub accurate_crosses: u32,
    pub final_third_entries: u32,
    pub touches_in_box: u32,
    pub dribbles: u32,
    pub successful_dribbles: u32,

    pub duels_won: u32,
    pub aerial_duels_won: u32,
    pub ground_duels_won: u32,
    pub tackles: u32,
    pub interceptions: u32,
    pub clearances: u32,
    pub recoveries: u32,
    pub saves: u32,

    pub attacks: u32,
    pub dangerous_attacks: u32,
}

impl SideStats {
    pub fn cards(&self) -> u32 {
        self.yellow_cards.saturating_add(self.red_cards)
    }

    pub fn defensive_actions(&self) -> u32 {
        self.tackles
            .saturating_add(self.interceptions)
            .saturating_add(self.clearances)
    }
}

/// One capture of an in-progress match. Never mutated once built; a newer
/// capture is appended to the [`SnapshotHistory`] instead.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchSnapshot {
    pub minute: u16,
    #[serde(default)]
    pub home_score: u8,
    #[serde(default)]
    pub away_score: u8,
    #[serde(default)]
    pub home: SideStats,
    #[serde(default)]
    pub away: SideStats,
}

impl MatchSnapshot {
    pub fn total_goals(&self) -> u32 {
        self.home_score as u32 + self.away_score as u32
    }

    pub fn score_diff(&self) -> i32 {
        self.home_score as i32 - self.away_score as i32
    }

    pub fn both_scored(&self) -> bool {
        self.home_score > 0 && self.away_score > 0
    }

    /// Both sides summed. Saturates so a corrupt counter cannot overflow.
    pub fn total(&self, f: impl Fn(&SideStats) -> u32) -> u32 {
        f(&self.home).saturating_add(f(&self.away))
    }

    /// Current combined count for an over/under market.
    pub fn market_count(&self, market: Market) -> f64 {
        let v = match market {
            Market::Goals => self.total_goals(),
            Market::Corners => self.total(|s| s.corners),
            Market::Fouls => self.total(|s| s.fouls),
            Market::Cards => self.total(SideStats::cards),
            Market::Shots => self.total(|s| s.total_shots),
            Market::ShotsOnTarget => self.total(|s| s.shots_on_target),
            Market::ThrowIns => self.total(|s| s.throw_ins),
            Market::Offsides => self.total(|s| s.offsides),
            Market::Btts => u32::from(self.both_scored()),
            Market::MatchResult => 0,
        };
        v as f64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Market {
    Goals,
    Corners,
    Fouls,
    Cards,
    Shots,
    ShotsOnTarget,
    ThrowIns,
    Offsides,
    Btts,
    MatchResult,
}

impl Market {
    pub const OVER_UNDER: [Market; 8] = [
        Market::Goals,
        Market::Corners,
        Market::Fouls,
        Market::Cards,
        Market::Shots,
        Market::ShotsOnTarget,
        Market::ThrowIns,
        Market::Offsides,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Market::Goals => "goals",
            Market::Corners => "corners",
            Market::Fouls => "fouls",
            Market::Cards => "cards",
            Market::Shots => "shots",
            Market::ShotsOnTarget => "shots_on_target",
            Market::ThrowIns => "throw_ins",
            Market::Offsides => "offsides",
            Market::Btts => "btts",
            Market::MatchResult => "match_result",
        }
    }

    pub fn is_over_under(self) -> bool {
        !matches!(self, Market::Btts | Market::MatchResult)
    }
}

impl std::fmt::Display for Market {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryPoint {
    pub minute: u16,
    pub captured_at: DateTime<Utc>,
    pub snapshot: MatchSnapshot,
}

/// Ordered, append-only capture log for one match session.
///
/// Deserialization replays every point through [`SnapshotHistory::push`], so a
/// stored log gets the same ordering check as a live one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(into = "Vec<HistoryPoint>", try_from = "Vec<HistoryPoint>")]
pub struct SnapshotHistory {
    points: Vec<HistoryPoint>,
}

impl TryFrom<Vec<HistoryPoint>> for SnapshotHistory {
    type Error = AnalysisError;

    fn try_from(points: Vec<HistoryPoint>) -> Result<Self, Self::Error> {
        let mut history = Self::new();
        for point in points {
            history.push(point.snapshot, point.captured_at)?;
        }
        Ok(history)
    }
}

impl From<SnapshotHistory> for Vec<HistoryPoint> {
    fn from(history: SnapshotHistory) -> Self {
        history.points
    }
}

impl SnapshotHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, snapshot: MatchSnapshot, captured_at: DateTime<Utc>) -> Result<(), AnalysisError> {
        if let Some(last) = self.points.last() {
            if snapshot.minute < last.minute {
                return Err(AnalysisError::OutOfOrderSnapshot {
                    last: last.minute,
                    incoming: snapshot.minute,
                });
            }
        }
        self.points.push(HistoryPoint {
            minute: snapshot.minute,
            captured_at,
            snapshot,
        });
        Ok(())
    }

    pub fn from_snapshots(snapshots: impl IntoIterator<Item = MatchSnapshot>) -> Result<Self, AnalysisError> {
        let mut history = Self::new();
        for snap in snapshots {
            history.push(snap, Utc::now())?;
        }
        Ok(history)
    }

    pub fn points(&self) -> &[HistoryPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn latest(&self) -> Option<&MatchSnapshot> {
        self.points.last().map(|p| &p.snapshot)
    }

    /// `(minute, value)` series for one extracted statistic.
    pub fn series(&self, extract: impl Fn(&MatchSnapshot) -> f64) -> Vec<(f64, f64)> {
        self.points
            .iter()
            .map(|p| (p.minute as f64, extract(&p.snapshot)))
            .collect()
    }
}
