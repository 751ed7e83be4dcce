// Ingest writer tests: flush on threshold, flush on close, pods before network rows

mod common;

use common::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tempfile::TempDir;
use utilization::models::IngestBatch;
use utilization::sample_repo::SampleRepo;
use utilization::source::{NetworkSampleSource, ProcessSampleSource, ScanQuery};
use utilization::writer::{WriterConfig, spawn_writer, writer_channel_capacity};

async fn open_repo(dir: &TempDir) -> Arc<SampleRepo> {
    let path = dir.path().join("samples.db");
    let repo = SampleRepo::connect(path.to_str().unwrap(), 3).await.unwrap();
    repo.init().await.unwrap();
    Arc::new(repo)
}

fn config(flush_rate: u64) -> WriterConfig {
    WriterConfig {
        flush_rate,
        flush_interval_secs: 3600,
        prune_interval_secs: 3600,
        stats_log_interval_secs: 3600,
    }
}

fn node_a() -> ScanQuery {
    ScanQuery {
        node: "node-a".into(),
        start_ns: 0,
        end_ns: None,
    }
}

#[test]
fn channel_capacity_has_a_floor() {
    assert_eq!(writer_channel_capacity(1), 32);
    assert_eq!(writer_channel_capacity(100), 200);
}

#[tokio::test]
async fn writer_flushes_remaining_on_close() {
    let dir = TempDir::new().unwrap();
    let repo = open_repo(&dir).await;
    let saved = Arc::new(AtomicU64::new(0));
    let (tx, rx) = tokio::sync::mpsc::channel(writer_channel_capacity(1000));
    let handle = spawn_writer(rx, repo.clone(), config(1000), saved.clone());

    tx.send(IngestBatch {
        processes: vec![
            process(SEC, "p1", tags("node-a", "web-0", None, &[]), 1, 1),
            process(2 * SEC, "p1", tags("node-a", "web-0", None, &[]), 2, 1),
        ],
        ..Default::default()
    })
    .await
    .unwrap();
    drop(tx);
    handle.await.unwrap();

    assert_eq!(saved.load(Ordering::Relaxed), 2);
    let scanned = repo.scan_process_samples(&node_a()).await.unwrap();
    assert_eq!(scanned.len(), 2);
}

#[tokio::test]
async fn writer_flushes_at_threshold_and_saves_pods_first() {
    let dir = TempDir::new().unwrap();
    let repo = open_repo(&dir).await;
    let saved = Arc::new(AtomicU64::new(0));
    let (tx, rx) = tokio::sync::mpsc::channel(writer_channel_capacity(2));
    let handle = spawn_writer(rx, repo.clone(), config(2), saved.clone());

    tx.send(IngestBatch {
        network: vec![network(SEC, "uid-1", 10, 10)],
        pods: vec![pod("uid-1", "web-0", "node-a", &[])],
        ..Default::default()
    })
    .await
    .unwrap();

    // Threshold reached: flushed without closing the channel
    let deadline = tokio::time::Instant::now() + tokio::time::Duration::from_secs(3);
    while saved.load(Ordering::Relaxed) == 0 {
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for flush"
        );
        tokio::time::sleep(tokio::time::Duration::from_millis(20)).await;
    }
    let scanned = repo.scan_network_samples(&node_a()).await.unwrap();
    assert_eq!(scanned.len(), 1);
    assert_eq!(scanned[0].tags.pod.as_deref(), Some("web-0"));

    drop(tx);
    handle.await.unwrap();
    assert_eq!(saved.load(Ordering::Relaxed), 1);
}

#[tokio::test]
async fn failed_flush_does_not_duplicate_rows_on_retry() {
    let dir = TempDir::new().unwrap();
    let repo = open_repo(&dir).await;
    let path = dir.path().join("samples.db");
    let other = sqlx::SqlitePool::connect(&format!("sqlite:{}", path.to_str().unwrap()))
        .await
        .unwrap();
    sqlx::query("DROP TABLE network_samples")
        .execute(&other)
        .await
        .unwrap();

    let saved = Arc::new(AtomicU64::new(0));
    let (tx, rx) = tokio::sync::mpsc::channel(writer_channel_capacity(1));
    let handle = spawn_writer(rx, repo.clone(), config(1), saved.clone());
    tx.send(IngestBatch {
        processes: vec![process(SEC, "p1", tags("node-a", "web-0", None, &[]), 1, 1)],
        network: vec![network(SEC, "uid-1", 1, 1)],
        pods: vec![pod("uid-1", "web-0", "node-a", &[])],
    })
    .await
    .unwrap();

    // Let the threshold flush run and fail, then repair the table.
    tokio::time::sleep(tokio::time::Duration::from_millis(300)).await;
    assert_eq!(saved.load(Ordering::Relaxed), 0);
    repo.init().await.unwrap();

    drop(tx);
    handle.await.unwrap();

    assert_eq!(saved.load(Ordering::Relaxed), 2);
    let processes = repo.scan_process_samples(&node_a()).await.unwrap();
    assert_eq!(processes.len(), 1);
    let net = repo.scan_network_samples(&node_a()).await.unwrap();
    assert_eq!(net.len(), 1);
}
