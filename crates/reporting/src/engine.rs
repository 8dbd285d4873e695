//! Impact engine — runs one batch through normalization, parallel per-outlet
//! classification, segment reduction, and report assembly.

use std::sync::Arc;
use std::time::{Duration, Instant};

use impact_analytics::{
    classify_outlet, ClassifiedOutlet, NormalizedBatch, RecordNormalizer, SegmentAccumulator,
};
use impact_core::input::RawLine;
use impact_core::{AnalysisConfig, AnalyticsError, AnalyticsResult};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::assembler::{assemble, ImpactReport};

/// Output of one classification chunk.
struct ChunkResult {
    index: usize,
    classified: Vec<ClassifiedOutlet>,
    segments: SegmentAccumulator,
}

/// Batch analysis engine. Holds only immutable configuration, so one engine
/// can serve any number of sequential or concurrent runs.
#[derive(Debug, Clone)]
pub struct ImpactEngine {
    config: Arc<AnalysisConfig>,
}

impl ImpactEngine {
    pub fn new(config: AnalysisConfig) -> AnalyticsResult<Self> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
        })
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Analyze one batch. Either the full report or a single error.
    pub async fn run(&self, lines: Vec<RawLine>) -> AnalyticsResult<ImpactReport> {
        let started = Instant::now();
        let result = self.execute(lines).await;
        match &result {
            Ok(report) => {
                metrics::counter!("impact.runs.completed").increment(1);
                metrics::histogram!("impact.run.duration_seconds")
                    .record(started.elapsed().as_secs_f64());
                info!(
                    outlets = report.summary.total_outlets,
                    rejected = report.rejected_records.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Impact analysis completed"
                );
            }
            Err(e) => {
                metrics::counter!("impact.runs.failed").increment(1);
                warn!(error = %e, "Impact analysis failed");
            }
        }
        result
    }

    /// Same as [`ImpactEngine::run`], failing with `Timeout` once `limit`
    /// elapses. No partial report is produced.
    pub async fn run_with_timeout(
        &self,
        lines: Vec<RawLine>,
        limit: Duration,
    ) -> AnalyticsResult<ImpactReport> {
        match tokio::time::timeout(limit, self.run(lines)).await {
            Ok(result) => result,
            Err(_) => {
                metrics::counter!("impact.runs.failed").increment(1);
                warn!(timeout_ms = limit.as_millis() as u64, "Impact analysis timed out");
                Err(AnalyticsError::Timeout(limit.as_millis() as u64))
            }
        }
    }

    async fn execute(&self, lines: Vec<RawLine>) -> AnalyticsResult<ImpactReport> {
        let config = self.config.clone();
        let batch = tokio::task::spawn_blocking(move || {
            RecordNormalizer::new(&config.window).normalize(&lines)
        })
        .await
        .map_err(|e| AnalyticsError::Worker(e.to_string()))?;

        if batch.is_empty() {
            return Err(AnalyticsError::EmptyBatch {
                rejected: batch.rejected.len(),
            });
        }

        debug!(
            records = batch.record_count(),
            outlets = batch.outlets.len(),
            "Batch normalized"
        );
        let batch = Arc::new(batch);
        let (classified, segments) = self.classify_parallel(&batch).await?;
        let rollup = segments.finalize(&self.config);
        assemble(&batch, &classified, rollup, &self.config)
    }

    /// Split the id-sorted outlets into contiguous chunks, classify each on a
    /// blocking worker, then reduce in chunk order.
    async fn classify_parallel(
        &self,
        batch: &Arc<NormalizedBatch>,
    ) -> AnalyticsResult<(Vec<ClassifiedOutlet>, SegmentAccumulator)> {
        let total = batch.outlets.len();
        let workers = self.config.worker_count.clamp(1, total.max(1));
        let chunk_size = total.div_ceil(workers);

        let mut tasks = JoinSet::new();
        for (index, start) in (0..total).step_by(chunk_size).enumerate() {
            let end = (start + chunk_size).min(total);
            let batch = batch.clone();
            let config = self.config.clone();
            tasks.spawn_blocking(move || classify_chunk(index, &batch, start, end, &config));
        }

        let mut chunks = Vec::with_capacity(workers);
        while let Some(joined) = tasks.join_next().await {
            let chunk = joined.map_err(|e| AnalyticsError::Worker(e.to_string()))?;
            chunks.push(chunk);
        }
        chunks.sort_by_key(|c| c.index);

        let mut classified = Vec::with_capacity(total);
        let mut segments = SegmentAccumulator::new();
        for chunk in chunks {
            classified.extend(chunk.classified);
            segments.merge(chunk.segments);
        }

        metrics::counter!("impact.outlets.classified").increment(classified.len() as u64);
        debug!(outlets = classified.len(), workers, "Classification reduced");
        Ok((classified, segments))
    }
}

fn classify_chunk(
    index: usize,
    batch: &NormalizedBatch,
    start: usize,
    end: usize,
    config: &AnalysisConfig,
) -> ChunkResult {
    let mut classified = Vec::with_capacity(end - start);
    let mut segments = SegmentAccumulator::new();
    for outlet in &batch.outlets[start..end] {
        let result = classify_outlet(outlet, config);
        for label in result.labels.labels() {
            metrics::counter!("impact.outlets.labelled", "axis" => label.axis(), "label" => label.as_str())
                .increment(1);
        }
        segments.add(&result, outlet, &config.window);
        classified.push(result);
    }
    debug!(chunk = index, outlets = classified.len(), "Chunk classified");
    ChunkResult {
        index,
        classified,
        segments,
    }
}
