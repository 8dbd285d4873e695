//! Campaign impact core — record model, scenario labels, analysis
//! configuration, and error types shared by every pipeline stage.

pub mod config;
pub mod error;
#[cfg(any(test, feature = "test-fixtures"))]
pub mod fixtures;
pub mod input;
pub mod labels;
pub mod types;

pub use config::{AnalysisConfig, CampaignWindow, PeriodRange, SegmentBaseline};
pub use error::{AnalyticsError, AnalyticsResult};
