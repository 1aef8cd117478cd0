pub mod location;
pub mod ranking;
pub mod scoring;
pub mod skills;
pub mod weights;

pub use ranking::{MatchExplanation, RankingService};
pub use scoring::{MatchResult, MatchScorer, QualityLabel, ScoreBreakdown};
pub use weights::{Weights, WeightsError, DEFAULT_WEIGHTS};
