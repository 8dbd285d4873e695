//! Campaign impact analytics — record normalization, per-outlet scenario
//! classification, time-decay and redemption analysis, lift significance,
//! and segment rollups.

pub mod classifier;
pub mod decay;
pub mod lift;
pub mod normalizer;
pub mod redemption;
pub mod segments;
pub mod stats;

pub use classifier::{classify_outlet, ClassifiedOutlet};
pub use lift::{compare, OutletSample};
pub use normalizer::{normalize, NormalizedBatch, RecordNormalizer};
pub use segments::{RollupOutput, SegmentAccumulator, SegmentReport};
