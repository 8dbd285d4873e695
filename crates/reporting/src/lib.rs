//! Campaign impact reporting — timeline, report assembly, and the batch
//! engine that drives a run end to end.

pub mod assembler;
pub mod engine;
pub mod timeline;

pub use assembler::{CampaignSummary, ImpactReport, ScenarioBucket};
pub use engine::ImpactEngine;
pub use timeline::TimelinePoint;
