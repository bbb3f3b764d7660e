use std::env;
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, bail};
use inplay_analyzer::fake_feed::{self, SimulationParams};
use inplay_analyzer::{AnalysisConfig, AnalysisError, LiveAnalyzer, MatchSnapshot, SnapshotHistory, load_config};

#[derive(Debug, serde::Deserialize)]
struct LiveCase {
    #[serde(default)]
    match_id: Option<String>,
    /// Captures in chronological order; the last one is analysed.
    snapshots: Vec<MatchSnapshot>,
}

fn main() -> anyhow::Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("inplay_analyzer=info".parse()?),
        )
        .with_target(false)
        .init();

    let config = match env::var("ANALYSIS_CONFIG") {
        Ok(path) if !path.trim().is_empty() => load_config(&PathBuf::from(path))?,
        _ => AnalysisConfig::default(),
    };

    let mut args = env::args().skip(1);
    let (match_id, history) = match args.next().as_deref() {
        Some("--simulate") => {
            let seed = args
                .next()
                .map(|s| s.parse::<u64>())
                .transpose()
                .context("seed must be an integer")?
                .unwrap_or(2026);
            let minute = args
                .next()
                .map(|s| s.parse::<u16>())
                .transpose()
                .context("minute must be an integer")?
                .unwrap_or(60);
            let params = SimulationParams {
                until_minute: minute,
                ..SimulationParams::default()
            };
            (format!("sim-{seed}"), fake_feed::simulate_match(seed, &params)?)
        }
        Some(path) => load_case(PathBuf::from(path))?,
        None => load_case(PathBuf::from("tests/fixtures/live_case.json"))?,
    };

    let Some(snapshot) = history.latest().cloned() else {
        bail!("case has no snapshots");
    };

    let analyzer = LiveAnalyzer::new(config);
    let report = match analyzer.analyze(&match_id, &snapshot, &history) {
        Ok(report) => report,
        Err(AnalysisError::InvalidSnapshot(validation)) => {
            println!("Snapshot rejected ({:?}):", validation.severity);
            for e in &validation.errors {
                println!("  - {e}");
            }
            return Ok(());
        }
        Err(err) => return Err(err.into()),
    };

    println!("Match {} at {}'", report.match_id, report.minute);
    println!(
        "State: {:?} / {:?}, action {:?}",
        report.enriched.context.game_state,
        report.enriched.context.intensity,
        report.anomalies.recommended_action
    );
    for a in &report.anomalies.anomalies {
        println!("  anomaly {:?} [{:?}] {}", a.kind, a.severity, a.description);
    }

    println!();
    for m in &report.markets {
        let pick = m
            .best_pick
            .as_ref()
            .map(|p| format!("{:?} {} @ {:.0}", p.direction, p.threshold, p.confidence))
            .unwrap_or_else(|| "-".to_string());
        let verdict = report
            .verdicts
            .get(m.market.name())
            .map(|v| format!("{:.0}{}", v.overall_score, if v.is_approved { " ok" } else { "" }))
            .unwrap_or_else(|| "-".to_string());
        let gate = report
            .gates
            .get(m.market.name())
            .map(|g| if g.approved { "pass" } else { "fail" })
            .unwrap_or("-");
        println!(
            "{:<16} now {:>5.1} proj {:>5.1} ({:?})  best {:<18} rel {:<6} gate {}",
            m.market.name(),
            m.current_value,
            m.projected,
            m.method,
            pick,
            verdict,
            gate
        );
    }
    for m in &report.outcomes {
        for p in &m.predictions {
            println!(
                "{:<16} {:?} {:.1}% conf {:.0}",
                m.market.name(),
                p.selection,
                p.probability * 100.0,
                p.confidence
            );
        }
        if let Some(g) = report.gates.get(m.market.name()) {
            println!("{:<16} gate {} ({:?})", "", if g.approved { "pass" } else { "fail" }, g.tier);
        }
    }

    println!();
    if report.publishable.is_empty() && report.publishable_outcomes.is_empty() {
        println!("No publishable picks.");
    } else {
        println!("Publishable:");
        for p in &report.publishable {
            println!("  {}", p.reasoning);
        }
        for p in &report.publishable_outcomes {
            println!("  {} {}", p.market.name(), p.reasoning);
        }
    }

    Ok(())
}

fn load_case(path: PathBuf) -> anyhow::Result<(String, SnapshotHistory)> {
    let raw = fs::read_to_string(&path).with_context(|| format!("read case {}", path.display()))?;
    let case: LiveCase = serde_json::from_str(&raw).with_context(|| format!("parse case {}", path.display()))?;
    let history = SnapshotHistory::from_snapshots(case.snapshots)?;
    Ok((case.match_id.unwrap_or_else(|| "case".to_string()), history))
}
