pub mod recommendations;
pub mod similarity;
pub mod sources;

pub use recommendations::{RecommendationEngine, MAX_RECOMMENDATIONS};
