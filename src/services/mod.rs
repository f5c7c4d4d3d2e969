//! Application services

pub mod recommendations;

pub use recommendations::{ProjectionRebuild, RealtimeRecommendation, RecommendationService};
