use std::fmt::Write as _;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use vessel_config::MetricsConfig;

/// Shared runtime metrics store (§7 "periodic log line", §10.4).
///
/// Counters are lock-free atomics so the hot path never takes a lock to
/// bump a counter. The exporter task renders them into Prometheus text
/// format on demand and logs a summary line on a fixed interval
/// regardless of whether the HTTP endpoint is enabled.
pub struct RuntimeMetrics {
    records_consumed_total: AtomicU64,
    decode_errors_total: AtomicU64,
    rules_evaluated_total: AtomicU64,
    rule_matches_total: AtomicU64,
    rule_errors_total: AtomicU64,
    notifications_emitted_total: AtomicU64,
    notifications_dropped_total: AtomicU64,
    broadcast_lag_total: AtomicU64,
    state_store_errors_total: AtomicU64,
    relational_store_errors_total: AtomicU64,
    catalog_refresh_errors_total: AtomicU64,
    discovered_destinations: AtomicU64,
    discovered_areas: AtomicU64,
    discovered_vessel_types: AtomicU64,
    discovered_vessel_classes: AtomicU64,
    discovered_voyage_statuses: AtomicU64,
    discovered_vessels: AtomicU64,
}

impl RuntimeMetrics {
    pub fn new() -> Self {
        Self {
            records_consumed_total: AtomicU64::new(0),
            decode_errors_total: AtomicU64::new(0),
            rules_evaluated_total: AtomicU64::new(0),
            rule_matches_total: AtomicU64::new(0),
            rule_errors_total: AtomicU64::new(0),
            notifications_emitted_total: AtomicU64::new(0),
            notifications_dropped_total: AtomicU64::new(0),
            broadcast_lag_total: AtomicU64::new(0),
            state_store_errors_total: AtomicU64::new(0),
            relational_store_errors_total: AtomicU64::new(0),
            catalog_refresh_errors_total: AtomicU64::new(0),
            discovered_destinations: AtomicU64::new(0),
            discovered_areas: AtomicU64::new(0),
            discovered_vessel_types: AtomicU64::new(0),
            discovered_vessel_classes: AtomicU64::new(0),
            discovered_voyage_statuses: AtomicU64::new(0),
            discovered_vessels: AtomicU64::new(0),
        }
    }

    pub fn inc_records_consumed(&self) {
        self.records_consumed_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_decode_error(&self) {
        self.decode_errors_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_rules_evaluated(&self, n: u64) {
        self.rules_evaluated_total.fetch_add(n, Ordering::Relaxed);
    }

    pub fn inc_rule_match(&self) {
        self.rule_matches_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_rule_error(&self) {
        self.rule_errors_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_notification_emitted(&self) {
        self.notifications_emitted_total
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_notification_dropped(&self) {
        self.notifications_dropped_total
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_broadcast_lag(&self, skipped: u64) {
        self.broadcast_lag_total.fetch_add(skipped, Ordering::Relaxed);
    }

    pub fn inc_state_store_error(&self) {
        self.state_store_errors_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_relational_store_error(&self) {
        self.relational_store_errors_total
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_catalog_refresh_error(&self) {
        self.catalog_refresh_errors_total
            .fetch_add(1, Ordering::Relaxed);
    }

    /// Update the discovery-cardinality gauges (§4.2, `discovery-stats`).
    pub fn set_discovery_counts(&self, counts: &DiscoveryCounts) {
        self.discovered_destinations
            .store(counts.destinations, Ordering::Relaxed);
        self.discovered_areas.store(counts.areas, Ordering::Relaxed);
        self.discovered_vessel_types
            .store(counts.vessel_types, Ordering::Relaxed);
        self.discovered_vessel_classes
            .store(counts.vessel_classes, Ordering::Relaxed);
        self.discovered_voyage_statuses
            .store(counts.voyage_statuses, Ordering::Relaxed);
        self.discovered_vessels
            .store(counts.vessels, Ordering::Relaxed);
    }

    fn render_prometheus(&self) -> String {
        let mut out = String::with_capacity(2 * 1024);
        self.render_counter(&mut out, "vessel_records_consumed_total", self.records_consumed_total.load(Ordering::Relaxed));
        self.render_counter(&mut out, "vessel_decode_errors_total", self.decode_errors_total.load(Ordering::Relaxed));
        self.render_counter(&mut out, "vessel_rules_evaluated_total", self.rules_evaluated_total.load(Ordering::Relaxed));
        self.render_counter(&mut out, "vessel_rule_matches_total", self.rule_matches_total.load(Ordering::Relaxed));
        self.render_counter(&mut out, "vessel_rule_errors_total", self.rule_errors_total.load(Ordering::Relaxed));
        self.render_counter(&mut out, "vessel_notifications_emitted_total", self.notifications_emitted_total.load(Ordering::Relaxed));
        self.render_counter(&mut out, "vessel_notifications_dropped_total", self.notifications_dropped_total.load(Ordering::Relaxed));
        self.render_counter(&mut out, "vessel_broadcast_lag_total", self.broadcast_lag_total.load(Ordering::Relaxed));
        self.render_counter(&mut out, "vessel_state_store_errors_total", self.state_store_errors_total.load(Ordering::Relaxed));
        self.render_counter(&mut out, "vessel_relational_store_errors_total", self.relational_store_errors_total.load(Ordering::Relaxed));
        self.render_counter(&mut out, "vessel_catalog_refresh_errors_total", self.catalog_refresh_errors_total.load(Ordering::Relaxed));
        self.render_gauge(&mut out, "vessel_discovered_destinations", self.discovered_destinations.load(Ordering::Relaxed));
        self.render_gauge(&mut out, "vessel_discovered_areas", self.discovered_areas.load(Ordering::Relaxed));
        self.render_gauge(&mut out, "vessel_discovered_vessel_types", self.discovered_vessel_types.load(Ordering::Relaxed));
        self.render_gauge(&mut out, "vessel_discovered_vessel_classes", self.discovered_vessel_classes.load(Ordering::Relaxed));
        self.render_gauge(&mut out, "vessel_discovered_voyage_statuses", self.discovered_voyage_statuses.load(Ordering::Relaxed));
        self.render_gauge(&mut out, "vessel_discovered_vessels", self.discovered_vessels.load(Ordering::Relaxed));
        out
    }

    fn render_counter(&self, out: &mut String, name: &str, value: u64) {
        let _ = writeln!(out, "# TYPE {name} counter");
        let _ = writeln!(out, "{name} {value}");
    }

    fn render_gauge(&self, out: &mut String, name: &str, value: u64) {
        let _ = writeln!(out, "# TYPE {name} gauge");
        let _ = writeln!(out, "{name} {value}");
    }

    /// One-line summary for the periodic log (§7 "periodic log line").
    pub fn summary_line(&self) -> String {
        format!(
            "records={} decode_errors={} rule_matches={} notifications={} notifications_dropped={} discovered_vessels={}",
            self.records_consumed_total.load(Ordering::Relaxed),
            self.decode_errors_total.load(Ordering::Relaxed),
            self.rule_matches_total.load(Ordering::Relaxed),
            self.notifications_emitted_total.load(Ordering::Relaxed),
            self.notifications_dropped_total.load(Ordering::Relaxed),
            self.discovered_vessels.load(Ordering::Relaxed),
        )
    }
}

impl Default for RuntimeMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Discovery-set cardinalities, published on the `discovery-stats` broadcast
/// channel (§4.2) and mirrored into the metrics gauges above.
#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct DiscoveryCounts {
    pub destinations: u64,
    pub areas: u64,
    pub areas_level1: u64,
    pub vessel_types: u64,
    pub vessel_classes: u64,
    pub voyage_statuses: u64,
    pub vessels: u64,
}

/// Bind the metrics HTTP listener (if enabled) and run the periodic summary
/// log loop until cancelled. Collection itself (the atomics above) always
/// happens regardless of whether this task is spawned.
pub async fn run_metrics_task(
    metrics: Arc<RuntimeMetrics>,
    config: MetricsConfig,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let listener = if config.enabled {
        let l = TcpListener::bind(&config.listen).await?;
        vn_info!(res, listen = %config.listen, "metrics exporter started");
        Some(l)
    } else {
        None
    };

    let mut tick = tokio::time::interval(config.report_interval.as_duration());
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tick.tick() => {
                vn_info!(res, summary = %metrics.summary_line(), "metrics snapshot");
            }
            result = accept_or_pending(&listener) => {
                let (mut stream, _) = result?;
                let body = metrics.render_prometheus();
                let mut req_buf = [0u8; 512];
                let req_n = stream.read(&mut req_buf).await.unwrap_or(0);
                let is_metrics = req_n > 0
                    && std::str::from_utf8(&req_buf[..req_n]).unwrap_or("").starts_with("GET /metrics");
                if is_metrics {
                    let header = format!(
                        "HTTP/1.1 200 OK\r\nContent-Type: text/plain; version=0.0.4\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                        body.len()
                    );
                    stream.write_all(header.as_bytes()).await?;
                    stream.write_all(body.as_bytes()).await?;
                } else {
                    stream
                        .write_all(b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n")
                        .await?;
                }
                stream.shutdown().await?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_line_reflects_counters() {
        let metrics = RuntimeMetrics::new();
        metrics.inc_records_consumed();
        metrics.inc_records_consumed();
        metrics.inc_rule_match();
        metrics.inc_notification_emitted();
        metrics.set_discovery_counts(&DiscoveryCounts {
            vessels: 3,
            ..Default::default()
        });

        let line = metrics.summary_line();
        assert!(line.contains("records=2"));
        assert!(line.contains("rule_matches=1"));
        assert!(line.contains("notifications=1"));
        assert!(line.contains("discovered_vessels=3"));
    }

    #[test]
    fn prometheus_output_includes_every_series() {
        let metrics = RuntimeMetrics::new();
        metrics.inc_decode_error();
        let rendered = metrics.render_prometheus();
        assert!(rendered.contains("vessel_decode_errors_total 1"));
        assert!(rendered.contains("# TYPE vessel_discovered_vessels gauge"));
    }
}

/// Await a new connection if the listener is bound, otherwise block forever
/// so the `tokio::select!` arm above never fires when the exporter is
/// disabled (collection still happens; only the HTTP surface is gated).
async fn accept_or_pending(
    listener: &Option<TcpListener>,
) -> std::io::Result<(tokio::net::TcpStream, std::net::SocketAddr)> {
    match listener {
        Some(l) => l.accept().await,
        None => std::future::pending().await,
    }
}
