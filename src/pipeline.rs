//! End-to-end analysis of one live snapshot.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, info_span, warn};

use crate::anomaly::{self, AnomalyReport, RecommendedAction};
use crate::cache::ResultCache;
use crate::config::{AnalysisConfig, DEFAULT_CONFIG};
use crate::enrichment::{self, EnrichedMetrics};
use crate::error::AnalysisError;
use crate::projection::{self, MarketPrediction, OutcomeMarket, OutcomePrediction, OverUnderMarket, ProjectionContext};
use crate::reliability::{self, MarketBoard, ReliabilityContext, ReliabilityVerdict};
use crate::risk_gate::{self, GateDecision};
use crate::snapshot::{HistoryPoint, Market, MatchSnapshot, SnapshotHistory};
use crate::trend::{self, TrendReport};
use crate::validator::{self, ValidationReport};
use crate::weights::{self, DynamicWeights};

const DEFAULT_HOME_ADVANTAGE: f64 = 0.15;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub match_id: String,
    pub minute: u16,
    pub validation: ValidationReport,
    pub anomalies: AnomalyReport,
    pub enriched: EnrichedMetrics,
    pub trends: TrendReport,
    pub weights: DynamicWeights,
    pub markets: Vec<OverUnderMarket>,
    pub outcomes: Vec<OutcomeMarket>,
    /// Keyed by market name, one per best pick of every market.
    pub verdicts: BTreeMap<String, ReliabilityVerdict>,
    pub gates: BTreeMap<String, GateDecision>,
    pub publishable: Vec<MarketPrediction>,
    pub publishable_outcomes: Vec<OutcomePrediction>,
}

impl AnalysisReport {
    pub fn market(&self, market: Market) -> Option<&OverUnderMarket> {
        self.markets.iter().find(|m| m.market == market)
    }

    pub fn outcome(&self, market: Market) -> Option<&OutcomeMarket> {
        self.outcomes.iter().find(|m| m.market == market)
    }
}

pub struct LiveAnalyzer {
    config: AnalysisConfig,
    home_advantage: f64,
    cache: Option<ResultCache<AnalysisReport>>,
}

impl Default for LiveAnalyzer {
    fn default() -> Self {
        Self::new(DEFAULT_CONFIG.clone())
    }
}

impl LiveAnalyzer {
    pub fn new(config: AnalysisConfig) -> Self {
        Self {
            config,
            home_advantage: DEFAULT_HOME_ADVANTAGE,
            cache: None,
        }
    }

    pub fn with_cache(mut self, cache: ResultCache<AnalysisReport>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_home_advantage(mut self, home_advantage: f64) -> Self {
        self.home_advantage = home_advantage;
        self
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn cache(&self) -> Option<&ResultCache<AnalysisReport>> {
        self.cache.as_ref()
    }

    /// Run every stage on `snapshot`. `history` holds earlier captures of the
    /// same match; the snapshot itself is appended when it is not already the
    /// latest point.
    pub fn analyze(
        &self,
        match_id: &str,
        snapshot: &MatchSnapshot,
        history: &SnapshotHistory,
    ) -> Result<Arc<AnalysisReport>, AnalysisError> {
        let span = info_span!("analysis", match_id, minute = snapshot.minute);
        let _enter = span.enter();
        let cfg = &self.config;

        let validation = validator::validate(snapshot, &cfg.validator);
        if !validation.valid {
            warn!(errors = ?validation.errors, "snapshot rejected");
            return Err(AnalysisError::InvalidSnapshot(validation));
        }
        if !validation.warnings.is_empty() {
            debug!(warnings = ?validation.warnings, severity = ?validation.severity, "snapshot warnings");
        }

        if let Some(cache) = &self.cache {
            if let Some(hit) = cache.lookup(match_id, snapshot) {
                debug!(cached_minute = hit.minute, "cache hit");
                return Ok(hit);
            }
        }

        let anomalies = anomaly::detect(snapshot, &cfg.anomaly);
        for a in &anomalies.anomalies {
            info!(kind = ?a.kind, severity = ?a.severity, adjustment = a.confidence_adjustment, "{}", a.description);
        }

        let points = trend_points(history, snapshot);
        let (enriched, trends) = rayon::join(
            || {
                enrichment::enrich(
                    snapshot,
                    snapshot.home_score,
                    snapshot.away_score,
                    snapshot.minute,
                    &cfg.historical,
                    &cfg.enrichment,
                )
            },
            || trend::analyze_all(&points, snapshot.minute, &cfg.trend),
        );
        debug!(
            game_state = ?enriched.context.game_state,
            intensity = ?enriched.context.intensity,
            snapshots = points.len(),
            "enrichment and trends ready"
        );

        let weights = weights::compute_weights(
            snapshot.minute,
            snapshot.home_score,
            snapshot.away_score,
            enriched.context.game_state,
            self.home_advantage,
            enriched.context.intensity,
            &cfg.weights,
        );

        let ctx = ProjectionContext {
            enriched: &enriched,
            trends: &trends,
            weights: &weights,
            history_len: points.len(),
            minute: snapshot.minute,
            config: &cfg.projection,
            historical: &cfg.historical,
            risk: &cfg.risk,
        };
        let max_confidence = cfg.projection.max_confidence;
        let markets: Vec<OverUnderMarket> = Market::OVER_UNDER
            .into_iter()
            .map(|market| {
                let mut m = projection::project(market, snapshot.market_count(market), &ctx);
                let adjustment = anomalies.adjustment_for(market, &cfg.anomaly);
                adjust_market(&mut m, adjustment, max_confidence);
                m
            })
            .collect();
        let mut outcomes = projection::project_outcomes(snapshot.home_score, snapshot.away_score, &ctx);
        for m in &mut outcomes {
            let adjustment = anomalies.adjustment_for(m.market, &cfg.anomaly);
            adjust_outcome(m, adjustment, max_confidence);
        }

        let board = MarketBoard::from_markets(&markets);
        let mut verdicts = BTreeMap::new();
        let mut gates = BTreeMap::new();
        let mut publishable = Vec::new();
        for m in &markets {
            let Some(pick) = &m.best_pick else {
                continue;
            };
            let verdict = reliability::score(
                pick,
                &ReliabilityContext {
                    board: &board,
                    history: &points,
                    current_value: m.current_value,
                    minute: snapshot.minute,
                    config: &cfg.reliability,
                    historical: &cfg.historical,
                },
            );
            let gate = risk_gate::validate(
                m.market,
                pick.confidence,
                verdict.overall_score,
                risk_gate::baseline_deviation(pick.projected_value, cfg.historical.per90(m.market)),
                pick.safety_margin,
                &cfg.risk,
            );
            debug!(
                market = %m.market,
                threshold = pick.threshold,
                score = verdict.overall_score,
                approved = verdict.is_approved,
                gate = gate.approved,
                "best pick reviewed"
            );
            if verdict.is_approved && gate.approved {
                publishable.push(pick.clone());
            }
            verdicts.insert(m.market.name().to_string(), verdict);
            gates.insert(m.market.name().to_string(), gate);
        }

        // Outcome markets have no count of their own; they are judged
        // against the goals projection.
        let goals_now = snapshot.market_count(Market::Goals);
        let projected_goals = board.get(Market::Goals).unwrap_or(goals_now);
        let mut publishable_outcomes = Vec::new();
        for m in &outcomes {
            let Some(pick) = &m.best_pick else {
                continue;
            };
            let verdict = reliability::score_outcome(
                pick,
                &ReliabilityContext {
                    board: &board,
                    history: &points,
                    current_value: goals_now,
                    minute: snapshot.minute,
                    config: &cfg.reliability,
                    historical: &cfg.historical,
                },
            );
            let gate = risk_gate::validate(
                m.market,
                pick.confidence,
                verdict.overall_score,
                risk_gate::baseline_deviation(projected_goals, cfg.historical.per90(m.market)),
                pick.safety_margin,
                &cfg.risk,
            );
            debug!(
                market = %m.market,
                selection = ?pick.selection,
                score = verdict.overall_score,
                approved = verdict.is_approved,
                gate = gate.approved,
                "outcome pick reviewed"
            );
            if verdict.is_approved && gate.approved {
                publishable_outcomes.push(pick.clone());
            }
            verdicts.insert(m.market.name().to_string(), verdict);
            gates.insert(m.market.name().to_string(), gate);
        }

        let picks = publishable.len() + publishable_outcomes.len();
        if anomalies.recommended_action == RecommendedAction::AvoidBetting && picks > 0 {
            warn!(withheld = picks, "critical anomalies, withholding picks");
            publishable.clear();
            publishable_outcomes.clear();
        }
        info!(
            markets = markets.len() + outcomes.len(),
            publishable = publishable.len() + publishable_outcomes.len(),
            action = ?anomalies.recommended_action,
            "analysis complete"
        );

        let report = Arc::new(AnalysisReport {
            match_id: match_id.to_string(),
            minute: snapshot.minute,
            validation,
            anomalies,
            enriched,
            trends,
            weights,
            markets,
            outcomes,
            verdicts,
            gates,
            publishable,
            publishable_outcomes,
        });
        if let Some(cache) = &self.cache {
            cache.store(match_id, snapshot, Arc::clone(&report));
        }
        Ok(report)
    }
}

/// History up to the analysed minute, ending with the snapshot itself.
fn trend_points(history: &SnapshotHistory, snapshot: &MatchSnapshot) -> Vec<HistoryPoint> {
    let mut points: Vec<HistoryPoint> = history
        .points()
        .iter()
        .filter(|p| p.minute <= snapshot.minute)
        .cloned()
        .collect();
    match points.last_mut() {
        Some(last) if last.minute == snapshot.minute => {
            // Same minute; the analysed capture wins.
            last.snapshot = snapshot.clone();
        }
        _ => points.push(HistoryPoint {
            minute: snapshot.minute,
            captured_at: Utc::now(),
            snapshot: snapshot.clone(),
        }),
    }
    points
}

fn adjust_market(market: &mut OverUnderMarket, adjustment: f64, max_confidence: f64) {
    if adjustment == 0.0 {
        return;
    }
    for p in market.predictions.iter_mut().chain(market.best_pick.iter_mut()) {
        p.confidence = (p.confidence + adjustment).clamp(0.0, max_confidence);
    }
}

fn adjust_outcome(market: &mut OutcomeMarket, adjustment: f64, max_confidence: f64) {
    if adjustment == 0.0 {
        return;
    }
    for p in market.predictions.iter_mut().chain(market.best_pick.iter_mut()) {
        p.confidence = (p.confidence + adjustment).clamp(0.0, max_confidence);
    }
}
