// SQLite sample store. Raw counters per process and per pod, plus the pod table used
// to resolve a pod's node, name and labels at scan time.

mod labels;

use crate::models::{IngestBatch, NetworkSample, PodInfo, PodStatus, ProcessSample, Tags};
use crate::source::{NetworkSampleSource, ProcessSampleSource, ScanQuery};
use sqlx::Row;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteConnection, SqlitePool, SqlitePoolOptions, SqliteRow,
};
use std::path::Path;
use std::str::FromStr;
use tracing::instrument;

const NANOS_PER_DAY: i64 = 24 * 60 * 60 * 1_000_000_000;

/// Longest retention whose cutoff still fits in an `i64` nanosecond timestamp.
pub const MAX_RETENTION_DAYS: u32 = (i64::MAX / NANOS_PER_DAY) as u32;

pub struct SampleRepo {
    pool: SqlitePool,
    retention_ns: i64,
}

impl SampleRepo {
    pub async fn connect(path: &str, retention_days: u32) -> anyhow::Result<Self> {
        if let Some(parent) = Path::new(path).parent() {
            std::fs::create_dir_all(parent)?;
        }
        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}", path))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .busy_timeout(std::time::Duration::from_secs(5))
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);
        let retention_ns = i64::from(retention_days)
            .checked_mul(NANOS_PER_DAY)
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "retention of {retention_days} days does not fit in a nanosecond timestamp"
                )
            })?;
        let pool = SqlitePoolOptions::new().connect_with(opts).await?;
        Ok(Self { pool, retention_ns })
    }

    pub async fn init(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS process_samples (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                time_ns INTEGER NOT NULL,
                upid TEXT NOT NULL,
                node TEXT,
                pod TEXT,
                container TEXT,
                labels TEXT NOT NULL DEFAULT '{}',
                rss INTEGER NOT NULL,
                vsize INTEGER NOT NULL,
                cpu_ktime_ns INTEGER NOT NULL,
                cpu_utime_ns INTEGER NOT NULL,
                read_bytes INTEGER NOT NULL,
                write_bytes INTEGER NOT NULL,
                rchar INTEGER NOT NULL,
                wchar INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_process_samples_node_time ON process_samples(node, time_ns)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS network_samples (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                time_ns INTEGER NOT NULL,
                pod_id TEXT NOT NULL,
                rx_bytes INTEGER NOT NULL,
                tx_bytes INTEGER NOT NULL,
                rx_errors INTEGER NOT NULL,
                tx_errors INTEGER NOT NULL,
                rx_drops INTEGER NOT NULL,
                tx_drops INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_network_samples_pod_time ON network_samples(pod_id, time_ns)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS pods (
                pod_id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                namespace TEXT NOT NULL,
                node TEXT NOT NULL,
                created_at_ns INTEGER NOT NULL,
                status TEXT NOT NULL,
                labels TEXT NOT NULL DEFAULT '{}'
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_pods_node ON pods(node)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    #[instrument(skip(self, samples), fields(repo = "samples", operation = "save_process_samples", samples_count = samples.len()))]
    pub async fn save_process_samples(&self, samples: &[ProcessSample]) -> anyhow::Result<()> {
        if samples.is_empty() {
            return Ok(());
        }
        let mut tx = self.pool.begin().await?;
        insert_process_samples(&mut tx, samples).await?;
        tx.commit().await?;
        Ok(())
    }

    #[instrument(skip(self, samples), fields(repo = "samples", operation = "save_network_samples", samples_count = samples.len()))]
    pub async fn save_network_samples(&self, samples: &[NetworkSample]) -> anyhow::Result<()> {
        if samples.is_empty() {
            return Ok(());
        }
        let mut tx = self.pool.begin().await?;
        insert_network_samples(&mut tx, samples).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Insert or replace pod metadata (node placement, status, labels).
    #[instrument(skip(self, pods), fields(repo = "samples", operation = "upsert_pods", pods_count = pods.len()))]
    pub async fn upsert_pods(&self, pods: &[PodInfo]) -> anyhow::Result<()> {
        if pods.is_empty() {
            return Ok(());
        }
        let mut tx = self.pool.begin().await?;
        replace_pods(&mut tx, pods).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Pods, process samples and network samples of one ingest batch in a single
    /// transaction: either the whole batch is stored or none of it.
    #[instrument(skip(self, batch), fields(repo = "samples", operation = "save_batch", items = batch.len()))]
    pub async fn save_batch(&self, batch: &IngestBatch) -> anyhow::Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let mut tx = self.pool.begin().await?;
        replace_pods(&mut tx, &batch.pods).await?;
        insert_process_samples(&mut tx, &batch.processes).await?;
        insert_network_samples(&mut tx, &batch.network).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Pods scheduled on `node`, ordered by name.
    #[instrument(skip(self), fields(repo = "samples", operation = "list_pods"))]
    pub async fn list_pods(&self, node: &str) -> anyhow::Result<Vec<PodInfo>> {
        let rows = sqlx::query(
            "SELECT pod_id, name, namespace, node, created_at_ns, status, labels
             FROM pods WHERE node = $1 ORDER BY name ASC",
        )
        .bind(node)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(parse_pod_row).collect()
    }

    /// Creation time and status lookup by pod name.
    pub async fn find_pod(&self, name: &str) -> anyhow::Result<Option<PodInfo>> {
        let row = sqlx::query(
            "SELECT pod_id, name, namespace, node, created_at_ns, status, labels
             FROM pods WHERE name = $1 ORDER BY created_at_ns DESC LIMIT 1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(parse_pod_row).transpose()
    }

    /// Delete samples older than the retention window. Returns rows deleted.
    #[instrument(skip(self), fields(repo = "samples", operation = "prune_old_data"))]
    pub async fn prune_old_data(&self) -> anyhow::Result<u64> {
        let now_ns = i64::try_from(
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)?
                .as_nanos(),
        )?;
        self.prune_before(now_ns - self.retention_ns).await
    }

    /// Delete samples with `time_ns < cutoff_ns`. Returns rows deleted.
    pub async fn prune_before(&self, cutoff_ns: i64) -> anyhow::Result<u64> {
        let mut tx = self.pool.begin().await?;
        let p = sqlx::query("DELETE FROM process_samples WHERE time_ns < $1")
            .bind(cutoff_ns)
            .execute(&mut *tx)
            .await?;
        let n = sqlx::query("DELETE FROM network_samples WHERE time_ns < $1")
            .bind(cutoff_ns)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(p.rows_affected() + n.rows_affected())
    }
}

impl ProcessSampleSource for SampleRepo {
    #[instrument(skip(self), fields(repo = "samples", operation = "scan_process_samples"))]
    async fn scan_process_samples(&self, query: &ScanQuery) -> anyhow::Result<Vec<ProcessSample>> {
        let rows = sqlx::query(
            "SELECT time_ns, upid, node, pod, container, labels, rss, vsize,
                    cpu_ktime_ns, cpu_utime_ns, read_bytes, write_bytes, rchar, wchar
             FROM process_samples
             WHERE node = $1 AND time_ns >= $2 AND time_ns < COALESCE($3, 9223372036854775807)",
        )
        .bind(&query.node)
        .bind(query.start_ns)
        .bind(query.end_ns)
        .fetch_all(&self.pool)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            out.push(parse_process_row(row)?);
        }
        Ok(out)
    }
}

impl NetworkSampleSource for SampleRepo {
    #[instrument(skip(self), fields(repo = "samples", operation = "scan_network_samples"))]
    async fn scan_network_samples(&self, query: &ScanQuery) -> anyhow::Result<Vec<NetworkSample>> {
        let rows = sqlx::query(
            "SELECT n.time_ns, n.pod_id, p.name, p.node, p.labels,
                    n.rx_bytes, n.tx_bytes, n.rx_errors, n.tx_errors, n.rx_drops, n.tx_drops
             FROM network_samples n
             JOIN pods p ON p.pod_id = n.pod_id
             WHERE p.node = $1 AND n.time_ns >= $2 AND n.time_ns < COALESCE($3, 9223372036854775807)",
        )
        .bind(&query.node)
        .bind(query.start_ns)
        .bind(query.end_ns)
        .fetch_all(&self.pool)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            out.push(parse_network_row(row)?);
        }
        Ok(out)
    }
}

async fn insert_process_samples(
    conn: &mut SqliteConnection,
    samples: &[ProcessSample],
) -> anyhow::Result<()> {
    for s in samples {
        sqlx::query(
            r#"
            INSERT INTO process_samples
            (time_ns, upid, node, pod, container, labels, rss, vsize,
             cpu_ktime_ns, cpu_utime_ns, read_bytes, write_bytes, rchar, wchar)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(s.timestamp_ns)
        .bind(&s.upid)
        .bind(&s.tags.node)
        .bind(&s.tags.pod)
        .bind(&s.tags.container)
        .bind(labels::encode(&s.tags.labels)?)
        .bind(s.rss)
        .bind(s.vsize)
        .bind(s.cpu_ktime_ns)
        .bind(s.cpu_utime_ns)
        .bind(s.read_bytes)
        .bind(s.write_bytes)
        .bind(s.rchar)
        .bind(s.wchar)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

async fn insert_network_samples(
    conn: &mut SqliteConnection,
    samples: &[NetworkSample],
) -> anyhow::Result<()> {
    for s in samples {
        sqlx::query(
            r#"
            INSERT INTO network_samples
            (time_ns, pod_id, rx_bytes, tx_bytes, rx_errors, tx_errors, rx_drops, tx_drops)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(s.timestamp_ns)
        .bind(&s.pod_id)
        .bind(s.rx_bytes)
        .bind(s.tx_bytes)
        .bind(s.rx_errors)
        .bind(s.tx_errors)
        .bind(s.rx_drops)
        .bind(s.tx_drops)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

async fn replace_pods(conn: &mut SqliteConnection, pods: &[PodInfo]) -> anyhow::Result<()> {
    for p in pods {
        sqlx::query(
            "INSERT OR REPLACE INTO pods (pod_id, name, namespace, node, created_at_ns, status, labels) VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(&p.pod_id)
        .bind(&p.name)
        .bind(&p.namespace)
        .bind(&p.node)
        .bind(p.created_at_ns)
        .bind(p.status.as_str())
        .bind(labels::encode(&p.labels)?)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

fn parse_process_row(row: &SqliteRow) -> anyhow::Result<ProcessSample> {
    let labels: String = row.try_get("labels")?;
    Ok(ProcessSample {
        timestamp_ns: row.try_get("time_ns")?,
        upid: row.try_get("upid")?,
        tags: Tags {
            node: row.try_get("node")?,
            pod: row.try_get("pod")?,
            container: row.try_get("container")?,
            labels: labels::decode(&labels),
        },
        rss: row.try_get("rss")?,
        vsize: row.try_get("vsize")?,
        cpu_ktime_ns: row.try_get("cpu_ktime_ns")?,
        cpu_utime_ns: row.try_get("cpu_utime_ns")?,
        read_bytes: row.try_get("read_bytes")?,
        write_bytes: row.try_get("write_bytes")?,
        rchar: row.try_get("rchar")?,
        wchar: row.try_get("wchar")?,
    })
}

fn parse_network_row(row: &SqliteRow) -> anyhow::Result<NetworkSample> {
    let labels: String = row.try_get("labels")?;
    Ok(NetworkSample {
        timestamp_ns: row.try_get("time_ns")?,
        pod_id: row.try_get("pod_id")?,
        tags: Tags {
            node: Some(row.try_get("node")?),
            pod: Some(row.try_get("name")?),
            container: None,
            labels: labels::decode(&labels),
        },
        rx_bytes: row.try_get("rx_bytes")?,
        tx_bytes: row.try_get("tx_bytes")?,
        rx_errors: row.try_get("rx_errors")?,
        tx_errors: row.try_get("tx_errors")?,
        rx_drops: row.try_get("rx_drops")?,
        tx_drops: row.try_get("tx_drops")?,
    })
}

fn parse_pod_row(row: &SqliteRow) -> anyhow::Result<PodInfo> {
    let status: String = row.try_get("status")?;
    let labels: String = row.try_get("labels")?;
    Ok(PodInfo {
        pod_id: row.try_get("pod_id")?,
        name: row.try_get("name")?,
        namespace: row.try_get("namespace")?,
        node: row.try_get("node")?,
        created_at_ns: row.try_get("created_at_ns")?,
        status: PodStatus::parse(&status),
        labels: labels::decode(&labels),
    })
}
