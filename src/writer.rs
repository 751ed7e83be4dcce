// Ingest writer: batches incoming samples off the request path and flushes them to SQLite.
// Also owns the retention prune tick and the periodic ingest stats log.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc;
use tokio::time::{Duration, Instant, MissedTickBehavior, interval, interval_at};

use crate::models::IngestBatch;
use crate::sample_repo::SampleRepo;

/// Channel capacity for ingest batches (backpressure if the writer falls behind).
pub fn writer_channel_capacity(flush_rate: u64) -> usize {
    (flush_rate as usize * 2).max(32)
}

pub struct WriterConfig {
    /// Buffered items (processes + network rows + pods) that trigger a flush.
    pub flush_rate: u64,
    pub flush_interval_secs: u64,
    pub prune_interval_secs: u64,
    pub stats_log_interval_secs: u64,
}

/// Spawns the writer task. Flushes when the buffer holds `flush_rate` items, every
/// `flush_interval_secs`, and once more when every sender is dropped.
pub fn spawn_writer(
    mut rx: mpsc::Receiver<IngestBatch>,
    repo: Arc<SampleRepo>,
    config: WriterConfig,
    samples_saved_total: Arc<AtomicU64>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut buffer = IngestBatch::default();
        let mut flush_tick = interval(Duration::from_secs(config.flush_interval_secs));
        flush_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // Prune and stats wait one full period before their first tick.
        let prune_every = Duration::from_secs(config.prune_interval_secs);
        let mut prune_tick = interval_at(Instant::now() + prune_every, prune_every);
        prune_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let stats_every = Duration::from_secs(config.stats_log_interval_secs);
        let mut stats_tick = interval_at(Instant::now() + stats_every, stats_every);
        stats_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut rows_pruned_total: u64 = 0;

        loop {
            tokio::select! {
                result = rx.recv() => {
                    match result {
                        Some(batch) => {
                            buffer.extend(batch);
                            if buffer.len() >= config.flush_rate as usize
                                && let Err(e) = flush_buffer(&repo, &mut buffer, &samples_saved_total).await
                            {
                                tracing::warn!(error = %e, "ingest writer: flush failed");
                            }
                        }
                        None => break,
                    }
                }
                _ = flush_tick.tick() => {
                    if let Err(e) = flush_buffer(&repo, &mut buffer, &samples_saved_total).await {
                        tracing::warn!(error = %e, "ingest writer: flush failed");
                    }
                }
                _ = prune_tick.tick() => {
                    match repo.prune_old_data().await {
                        Ok(n) => {
                            rows_pruned_total += n;
                            tracing::debug!(operation = "prune_old_data", rows = n, "Old samples pruned");
                        }
                        Err(e) => tracing::warn!(
                            error = %e,
                            operation = "prune_old_data",
                            "Failed to prune old samples"
                        ),
                    }
                }
                _ = stats_tick.tick() => {
                    tracing::info!(
                        samples_saved_total = samples_saved_total.load(Ordering::Relaxed),
                        rows_pruned_total,
                        buffered = buffer.len(),
                        "ingest stats"
                    );
                }
            }
        }
        if let Err(e) = flush_buffer(&repo, &mut buffer, &samples_saved_total).await {
            tracing::warn!(error = %e, "ingest writer: final flush failed");
        }
        tracing::debug!("Ingest writer shutting down");
    })
}

/// The buffer is written in one transaction; on failure nothing is stored and the
/// whole buffer is retried on the next flush.
async fn flush_buffer(
    repo: &SampleRepo,
    buffer: &mut IngestBatch,
    samples_saved_total: &AtomicU64,
) -> anyhow::Result<()> {
    if buffer.is_empty() {
        return Ok(());
    }
    repo.save_batch(buffer).await?;

    let samples = buffer.processes.len() + buffer.network.len();
    samples_saved_total.fetch_add(samples as u64, Ordering::Relaxed);
    tracing::debug!(
        operation = "flush_ingest",
        processes = buffer.processes.len(),
        network = buffer.network.len(),
        pods = buffer.pods.len(),
        "Ingest batch saved"
    );
    *buffer = IngestBatch::default();
    Ok(())
}
