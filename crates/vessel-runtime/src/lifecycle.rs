use std::sync::Arc;
use std::time::Duration;

use orion_error::StructError;
use orion_error::op_context;
use orion_error::prelude::*;
use sqlx::postgres::PgPoolOptions;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use vessel_config::{AppConfig, PostgresConfig};

use crate::catalog::RuleCatalog;
use crate::error::{RuntimeReason, RuntimeResult};
use crate::metrics::{RuntimeMetrics, run_metrics_task};
use crate::migrations;
use crate::processor::Processor;
use crate::sink::NotificationSink;
use crate::source::RecordSource;
use crate::store::StateStore;

/// How often the discovery-set cardinalities are recomputed and published on
/// the `discovery-stats` channel. Not operator-tunable — §4.2 only requires
/// "at least once a minute", and that requirement is met unconditionally.
const DISCOVERY_STATS_INTERVAL: Duration = Duration::from_secs(60);

/// Admin flags that alter the startup sequence (§4.8, §10.6's `--reset` /
/// `--from-beginning`).
#[derive(Debug, Clone, Copy, Default)]
pub struct StartOptions {
    pub reset: bool,
    pub from_beginning: bool,
}

// ---------------------------------------------------------------------------
// TaskGroup — named collection of async tasks for ordered shutdown
// ---------------------------------------------------------------------------

/// A named group of async tasks that are shut down together.
///
/// Groups are assembled in *start order* and joined in *reverse order*
/// (LIFO) during shutdown:
///
///   start: catalog-refresh → discovery-stats → metrics → consumer
///   join:  consumer → metrics → discovery-stats → catalog-refresh
///
/// Joining the consumer first lets it finish whatever record is mid-flight
/// and flush its committed offsets before the ambient tasks are torn down.
struct TaskGroup {
    name: &'static str,
    handles: Vec<JoinHandle<anyhow::Result<()>>>,
}

impl TaskGroup {
    fn new(name: &'static str, handle: JoinHandle<anyhow::Result<()>>) -> Self {
        Self {
            name,
            handles: vec![handle],
        }
    }

    async fn wait(self) -> RuntimeResult<()> {
        for handle in self.handles {
            handle
                .await
                .map_err(|e| {
                    StructError::from(RuntimeReason::Shutdown)
                        .with_detail(format!("task join error: {e}"))
                })?
                .owe(RuntimeReason::Shutdown)?;
        }
        Ok(())
    }
}

/// Engine (the composition root): owns the relational pool and every
/// background task group, and carries out the startup/reset/shutdown
/// sequence from §4.8.
pub struct Engine {
    cancel: CancellationToken,
    groups: Vec<TaskGroup>,
    pool: sqlx::PgPool,
}

impl Engine {
    /// Bootstrap the whole runtime: connect the relational store, the state
    /// store, and the broadcast channels; apply `--reset` / `--from-beginning`
    /// if requested; connect the record source; start every background task.
    #[tracing::instrument(name = "engine.start", skip_all, fields(reset = options.reset, from_beginning = options.from_beginning))]
    pub async fn start(config: AppConfig, options: StartOptions) -> RuntimeResult<Self> {
        let mut op = op_context!("engine-bootstrap").with_auto_log();
        op.record("reset", options.reset.to_string().as_str());
        op.record("from_beginning", options.from_beginning.to_string().as_str());

        let pool = connect_postgres(&config.postgres).await?;
        vn_info!(conn, "relational store connected");
        migrations::run(&pool).await?;

        let store = StateStore::connect(&config.redis).await?;
        vn_info!(conn, "state store connected");

        let sink = Arc::new(NotificationSink::new(pool.clone()));
        let metrics = Arc::new(RuntimeMetrics::new());

        let mut kafka_config = config.kafka.clone();
        let mut from_beginning = options.from_beginning;
        if options.reset {
            vn_info!(sys, "reset requested: deleting consumer group and purging state store");
            RecordSource::reset_consumer_group(&mut kafka_config).await?;
            store.purge_all().await?;
            from_beginning = true;
        }

        let source = RecordSource::connect(kafka_config, from_beginning).await?;
        let catalog = RuleCatalog::bootstrap(pool.clone()).await?;
        let processor = Arc::new(Processor::new(
            store.clone(),
            Arc::clone(&catalog),
            Arc::clone(&sink),
            Arc::clone(&metrics),
            config.notification.clone(),
        ));

        let cancel = CancellationToken::new();
        let mut groups = Vec::with_capacity(4);

        groups.push(TaskGroup::new(
            "catalog-refresh",
            catalog.spawn_refresh_task(config.catalog.clone(), cancel.child_token()),
        ));

        groups.push(spawn_discovery_stats_task(
            store.clone(),
            Arc::clone(&sink),
            Arc::clone(&metrics),
            cancel.child_token(),
        ));

        groups.push(spawn_metrics_task(metrics, config.metrics.clone(), cancel.child_token()));

        groups.push(spawn_consumer_task(source, processor, cancel.child_token()));

        op.mark_suc();
        Ok(Self { cancel, groups, pool })
    }

    /// Request cancellation of every background task.
    pub fn shutdown(&self) {
        vn_info!(sys, "initiating graceful shutdown");
        self.cancel.cancel();
    }

    /// Clone of the root cancellation token, for signal-handler integration.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Join every task group in LIFO order, then close the relational pool.
    /// The broadcast channels have no explicit close — they shut down when
    /// the last `Arc<NotificationSink>` referencing them is dropped.
    pub async fn wait(mut self) -> RuntimeResult<()> {
        while let Some(group) = self.groups.pop() {
            let name = group.name;
            vn_debug!(sys, task_group = name, "waiting for task group to finish");
            group.wait().await?;
            vn_debug!(sys, task_group = name, "task group finished");
        }
        self.pool.close().await;
        vn_info!(sys, "relational store closed");
        Ok(())
    }
}

/// Open the relational store pool. Shared by [`Engine::start`] and the CLI's
/// `--info` admin query, which needs a pool but none of the rest of the
/// engine.
pub async fn connect_postgres(config: &PostgresConfig) -> RuntimeResult<sqlx::PgPool> {
    PgPoolOptions::new()
        .max_connections(config.pool_size)
        .connect(&config.url)
        .await
        .owe(RuntimeReason::Bootstrap)
}

fn spawn_consumer_task(
    mut source: RecordSource,
    processor: Arc<Processor>,
    cancel: CancellationToken,
) -> TaskGroup {
    let handle = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                result = source.next() => {
                    let message = result?;
                    match processor.process(message.record.clone()).await {
                        Ok(()) => {
                            source.ack(&message)?;
                        }
                        Err(e) => {
                            vn_warn!(pipe, imo = message.record.imo, error = %e, "record processing failed, offset not advanced");
                        }
                    }
                }
            }
        }
        // Graceful drain: flush whatever offsets were stored before returning.
        source.flush_commits().await?;
        Ok(())
    });
    TaskGroup::new("consumer", handle)
}

fn spawn_metrics_task(
    metrics: Arc<RuntimeMetrics>,
    config: vessel_config::MetricsConfig,
    cancel: CancellationToken,
) -> TaskGroup {
    let handle = tokio::spawn(run_metrics_task(metrics, config, cancel));
    TaskGroup::new("metrics", handle)
}

/// Periodic `discovery-stats` publish (§4.2): recompute every dimension's
/// cardinality and broadcast it, at least once a minute.
fn spawn_discovery_stats_task(
    store: StateStore,
    sink: Arc<NotificationSink>,
    metrics: Arc<RuntimeMetrics>,
    cancel: CancellationToken,
) -> TaskGroup {
    let handle = tokio::spawn(async move {
        let mut tick = tokio::time::interval(DISCOVERY_STATS_INTERVAL);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tick.tick() => {
                    match store.discovery_counts().await {
                        Ok(counts) => {
                            metrics.set_discovery_counts(&counts);
                            sink.publish_discovery_stats(&counts, chrono::Utc::now());
                        }
                        Err(e) => vn_warn!(res, error = %e, "failed to compute discovery stats, skipping this tick"),
                    }
                }
            }
        }
        Ok(())
    });
    TaskGroup::new("discovery-stats", handle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn task_group_wait_propagates_task_error() {
        let handle: JoinHandle<anyhow::Result<()>> =
            tokio::spawn(async { Err(anyhow::anyhow!("boom")) });
        let group = TaskGroup::new("failing", handle);
        assert!(group.wait().await.is_err());
    }

    #[tokio::test]
    async fn task_group_wait_succeeds_when_task_succeeds() {
        let handle: JoinHandle<anyhow::Result<()>> = tokio::spawn(async { Ok(()) });
        let group = TaskGroup::new("ok", handle);
        assert!(group.wait().await.is_ok());
    }

    #[tokio::test]
    async fn groups_join_in_lifo_order() {
        use std::sync::Arc;
        use tokio::sync::Mutex;

        let order = Arc::new(Mutex::new(Vec::new()));
        let mut groups = Vec::new();
        for name in ["first", "second", "third"] {
            let order = Arc::clone(&order);
            let handle: JoinHandle<anyhow::Result<()>> = tokio::spawn(async move {
                order.lock().await.push(name);
                Ok(())
            });
            groups.push(TaskGroup::new(name, handle));
        }

        let mut joined = Vec::new();
        while let Some(group) = groups.pop() {
            joined.push(group.name);
            group.wait().await.unwrap();
        }
        assert_eq!(joined, vec!["third", "second", "first"]);
    }
}
