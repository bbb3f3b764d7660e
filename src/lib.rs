pub mod anomaly;
pub mod cache;
pub mod config;
pub mod enrichment;
pub mod error;
pub mod fake_feed;
pub mod pipeline;
pub mod projection;
pub mod reliability;
pub mod risk_gate;
pub mod settlement;
pub mod snapshot;
pub mod trend;
pub mod validator;
pub mod weights;

pub use config::{AnalysisConfig, DEFAULT_CONFIG, load_config};
pub use error::AnalysisError;
pub use pipeline::{AnalysisReport, LiveAnalyzer};
pub use snapshot::{Market, MatchSnapshot, SideStats, SnapshotHistory};
