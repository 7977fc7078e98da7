pub mod catalog;
pub mod chat;
pub mod constraints;
pub mod justifier;
pub mod llm;
pub mod planner;
pub mod recommender;
pub mod retry;
pub mod sampler;
pub mod scoring;

pub use recommender::{PipelineSettings, Recommender};
