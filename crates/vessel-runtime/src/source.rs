use std::time::Duration;

use chrono::Utc;
use orion_error::prelude::*;
use orion_error::StructError;
use rdkafka::Message;
use rdkafka::admin::{AdminClient, AdminOptions};
use rdkafka::client::DefaultClientContext;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{BaseConsumer, CommitMode, Consumer, StreamConsumer};
use rdkafka::error::KafkaError;

use vessel_config::KafkaConfig;
use vessel_core::record::VesselRecord;

use crate::error::{RuntimeReason, RuntimeResult};

/// Topic this engine consumes by default (§4.1).
pub const DEFAULT_TOPIC: &str = "vessel.state.changed";

/// Cap on reconnect backoff after a transport disconnect (§4.1).
const MAX_BACKOFF: Duration = Duration::from_secs(2);

/// How many consecutive decode errors to log in full before suppressing
/// further ones on the same streak (§4.1 "first N are logged").
const DECODE_ERROR_LOG_BURST: u64 = 5;

/// A single decoded record, paired with the completion handle the Processor
/// calls once the record has been fully applied, so the source never
/// advances its committed offset ahead of completed work.
pub struct SourceMessage {
    pub record: VesselRecord,
    partition: i32,
    offset: i64,
}

impl SourceMessage {
    pub fn partition(&self) -> i32 {
        self.partition
    }

    pub fn offset(&self) -> i64 {
        self.offset
    }
}

/// Record Source (C1): an rdkafka consumer-group client over a single topic,
/// with manual offset storage committed only after the Processor signals a
/// record is fully applied.
pub struct RecordSource {
    consumer: StreamConsumer,
    config: KafkaConfig,
    topic: String,
    decode_errors_in_streak: u64,
}

impl RecordSource {
    pub async fn connect(config: KafkaConfig, from_beginning: bool) -> RuntimeResult<Self> {
        let topic = if config.topic.is_empty() {
            DEFAULT_TOPIC.to_string()
        } else {
            config.topic.clone()
        };
        let mut client_config = base_client_config(&config);
        client_config
            .set("enable.auto.commit", "false")
            .set("enable.auto.offset.store", "false")
            .set(
                "auto.offset.reset",
                if from_beginning { "earliest" } else { "latest" },
            );

        let consumer: StreamConsumer = client_config.create().owe(RuntimeReason::Source)?;
        consumer
            .subscribe(&[topic.as_str()])
            .owe(RuntimeReason::Source)?;

        vn_info!(conn, topic = %topic, group = %config.group_id, from_beginning, "record source connected");

        Ok(Self {
            consumer,
            config,
            topic,
            decode_errors_in_streak: 0,
        })
    }

    /// Receive the next record, reconnecting with bounded exponential backoff
    /// on transport failures and skipping (rather than blocking on) records
    /// that fail to decode.
    pub async fn next(&mut self) -> RuntimeResult<SourceMessage> {
        let mut backoff = Duration::from_millis(50);
        loop {
            match self.consumer.recv().await {
                Ok(borrowed) => {
                    let partition = borrowed.partition();
                    let offset = borrowed.offset();
                    let payload = match borrowed.payload() {
                        Some(p) => p,
                        None => {
                            self.note_decode_error(partition, offset, "empty payload");
                            continue;
                        }
                    };
                    match serde_json::from_slice::<VesselRecord>(payload) {
                        Ok(record) => {
                            self.decode_errors_in_streak = 0;
                            return Ok(SourceMessage {
                                record,
                                partition,
                                offset,
                            });
                        }
                        Err(e) => {
                            self.note_decode_error(partition, offset, &e.to_string());
                            continue;
                        }
                    }
                }
                Err(e) => {
                    vn_warn!(conn, error = %e, backoff_ms = backoff.as_millis() as u64, "kafka transport error, retrying");
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                }
            }
        }
    }

    /// The consumer group this source is currently bound to, reflecting any
    /// reset-time substitution (§4.1).
    pub fn group_id(&self) -> &str {
        &self.config.group_id
    }

    fn note_decode_error(&mut self, partition: i32, offset: i64, reason: &str) {
        self.decode_errors_in_streak += 1;
        if self.decode_errors_in_streak <= DECODE_ERROR_LOG_BURST {
            vn_warn!(pipe, partition, offset, reason, "skipping undecodable record");
        } else if self.decode_errors_in_streak == DECODE_ERROR_LOG_BURST + 1 {
            vn_warn!(pipe, "further decode errors on this streak are suppressed");
        }
    }

    /// Mark `message` as fully applied. Stores the offset locally; the
    /// librdkafka client batches the actual commit internally, so this call
    /// never blocks on a round trip to the broker (§4.1 backpressure
    /// contract: never advance the commit point ahead of completed work).
    pub fn ack(&self, message: &SourceMessage) -> RuntimeResult<()> {
        self.consumer
            .store_offset(&self.topic, message.partition, message.offset)
            .owe(RuntimeReason::Source)
    }

    /// Force a synchronous commit of every stored offset, used on graceful
    /// shutdown so no acknowledged work is lost.
    pub async fn flush_commits(&self) -> RuntimeResult<()> {
        match self.consumer.commit_consumer_state(CommitMode::Sync) {
            Ok(()) => Ok(()),
            Err(KafkaError::ConsumerCommit(rdkafka::types::RDKafkaErrorCode::NoOffset)) => Ok(()),
            Err(e) => Err(e).owe(RuntimeReason::Source),
        }
    }

    /// Offset-reset operation (§4.1): delete the consumer group so the next
    /// connect starts clean. If the broker refuses because the group still
    /// has members, synthesize a fresh, timestamp-suffixed group id instead
    /// of failing the reset outright.
    pub async fn reset_consumer_group(config: &mut KafkaConfig) -> RuntimeResult<()> {
        let admin_config = base_client_config(config);
        let admin: AdminClient<DefaultClientContext> =
            admin_config.create().owe(RuntimeReason::Source)?;
        let opts = AdminOptions::new().operation_timeout(Some(Duration::from_secs(30)));

        let results = admin
            .delete_groups(&[config.group_id.as_str()], &opts)
            .await
            .owe(RuntimeReason::Source)?;

        for result in results {
            if let Err((group, err)) = result {
                vn_warn!(conn, group = %group, error = %err, "failed to delete consumer group, synthesizing a fresh group id");
                config.group_id = format!("{}-reset-{}", config.group_id, Utc::now().timestamp());
            }
        }
        Ok(())
    }

    /// Administrative query: number of partitions on the configured topic.
    pub fn partition_count(&self) -> RuntimeResult<usize> {
        partition_count(&self.consumer, &self.topic)
    }

    /// Administrative query: total backlog, summed as `high - low` across
    /// every partition of the configured topic.
    pub fn total_backlog(&self) -> RuntimeResult<i64> {
        total_backlog(&self.consumer, &self.topic)
    }
}

/// Shared implementation of the partition-count query, usable from either a
/// live [`RecordSource`] or a short-lived [`metadata_consumer`] (the CLI's
/// `--info` has no reason to open a full consumer group membership).
pub fn partition_count(consumer: &impl Consumer, topic: &str) -> RuntimeResult<usize> {
    let metadata = consumer
        .fetch_metadata(Some(topic), Duration::from_secs(10))
        .owe(RuntimeReason::Source)?;
    let topic_meta = metadata
        .topics()
        .iter()
        .find(|t| t.name() == topic)
        .ok_or_else(|| {
            StructError::from(RuntimeReason::Source)
                .with_detail(format!("topic '{topic}' not found in metadata"))
        })?;
    Ok(topic_meta.partitions().len())
}

/// Shared implementation of the backlog query (see [`partition_count`]).
pub fn total_backlog(consumer: &impl Consumer, topic: &str) -> RuntimeResult<i64> {
    let metadata = consumer
        .fetch_metadata(Some(topic), Duration::from_secs(10))
        .owe(RuntimeReason::Source)?;
    let topic_meta = metadata
        .topics()
        .iter()
        .find(|t| t.name() == topic)
        .ok_or_else(|| {
            StructError::from(RuntimeReason::Source)
                .with_detail(format!("topic '{topic}' not found in metadata"))
        })?;

    let mut backlog = 0i64;
    for partition in topic_meta.partitions() {
        let (low, high) = consumer
            .fetch_watermarks(topic, partition.id(), Duration::from_secs(10))
            .owe(RuntimeReason::Source)?;
        backlog += high - low;
    }
    Ok(backlog)
}

fn base_client_config(config: &KafkaConfig) -> ClientConfig {
    let mut client_config = ClientConfig::new();
    client_config
        .set("bootstrap.servers", &config.brokers)
        .set("group.id", &config.group_id)
        .set("client.id", &config.client_id)
        .set("session.timeout.ms", "30000");
    client_config
}

/// Short-lived metadata-only consumer, used by administrative queries that
/// run outside an active `RecordSource` (e.g. the CLI's `--info`).
pub fn metadata_consumer(config: &KafkaConfig) -> RuntimeResult<BaseConsumer> {
    let mut client_config = base_client_config(config);
    client_config.set("session.timeout.ms", "6000");
    client_config.create().owe(RuntimeReason::Source)
}
