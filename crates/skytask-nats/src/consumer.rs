use anyhow::{Context, Result};
use bytes::Bytes;
use futures::future::BoxFuture;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use async_nats::jetstream::{AckKind, Message};

use crate::subjects::deadletter_subject;
use crate::traits::{JetStreamConsumer, JetStreamPublisher, PullConsumer};

/// Result of processing a batch of messages: which indices to acknowledge
/// and which to reject (with an optional error detail).
#[derive(Debug)]
pub struct ProcessingResult {
    pub ack: Vec<usize>,
    pub nak: Vec<(usize, Option<String>)>,
}

impl ProcessingResult {
    pub fn ack_all(count: usize) -> Self {
        Self {
            ack: (0..count).collect(),
            nak: Vec::new(),
        }
    }

    pub fn nak_all(count: usize, error: Option<String>) -> Self {
        Self {
            ack: Vec::new(),
            nak: (0..count).map(|i| (i, error.clone())).collect(),
        }
    }

    pub fn new(ack: Vec<usize>, nak: Vec<(usize, Option<String>)>) -> Self {
        Self { ack, nak }
    }
}

/// Batch processor function: deserialization and business logic are the
/// processor's job; the consumer owns fetch, ack/nak, and dead-lettering.
pub type BatchProcessor =
    Box<dyn Fn(&[Message]) -> BoxFuture<'static, Result<ProcessingResult>> + Send + Sync>;

/// Durable JetStream pull consumer with explicit acks.
///
/// Rejected messages are redelivered by the broker. Once a message has
/// been delivered `max_deliveries` times without an ack, the consumer
/// copies its payload to the dead-letter stream and acks the original so
/// a poisoned message cannot wedge the subject.
pub struct NatsConsumer {
    consumer: Box<dyn PullConsumer>,
    deadletter_publisher: Arc<dyn JetStreamPublisher>,
    stream_name: String,
    batch_size: usize,
    max_wait: Duration,
    max_deliveries: i64,
    processor: BatchProcessor,
}

impl NatsConsumer {
    #[allow(clippy::too_many_arguments)]
    pub async fn new(
        jetstream: Arc<dyn JetStreamConsumer>,
        deadletter_publisher: Arc<dyn JetStreamPublisher>,
        stream_name: &str,
        consumer_name: &str,
        subject_filter: &str,
        batch_size: usize,
        max_wait_secs: u64,
        max_deliveries: i64,
        processor: BatchProcessor,
    ) -> Result<Self> {
        debug!(
            stream = %stream_name,
            consumer = %consumer_name,
            filter_subject = %subject_filter,
            "creating JetStream consumer"
        );

        let config = async_nats::jetstream::consumer::pull::Config {
            name: Some(consumer_name.to_string()),
            durable_name: Some(consumer_name.to_string()),
            filter_subject: subject_filter.to_string(),
            ack_policy: async_nats::jetstream::consumer::AckPolicy::Explicit,
            ..Default::default()
        };

        let consumer = jetstream
            .create_consumer(config, stream_name)
            .await
            .context("Failed to create consumer")?;

        info!(
            stream = %stream_name,
            consumer = %consumer_name,
            "consumer created"
        );

        Ok(Self {
            consumer,
            deadletter_publisher,
            stream_name: stream_name.to_string(),
            batch_size,
            max_wait: Duration::from_secs(max_wait_secs),
            max_deliveries,
            processor,
        })
    }

    pub async fn run(&self, ctx: CancellationToken) -> Result<()> {
        info!(stream = %self.stream_name, "starting consumer loop");

        loop {
            tokio::select! {
                _ = ctx.cancelled() => {
                    info!(stream = %self.stream_name, "received shutdown signal, stopping consumer");
                    break;
                }
                result = self.fetch_and_process_batch() => {
                    if let Err(e) = result {
                        error!(stream = %self.stream_name, error = %e, "error processing batch");
                        // Continue processing despite errors
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        }

        info!(stream = %self.stream_name, "consumer stopped gracefully");
        Ok(())
    }

    async fn fetch_and_process_batch(&self) -> Result<()> {
        let raw_messages = self
            .consumer
            .fetch_messages(self.batch_size, self.max_wait)
            .await?;

        if raw_messages.is_empty() {
            return Ok(());
        }

        debug!(
            stream = %self.stream_name,
            message_count = raw_messages.len(),
            "received message batch"
        );

        let processing_result = match (self.processor)(&raw_messages).await {
            Ok(result) => result,
            Err(e) => {
                error!(error = %e, "processor returned error, rejecting all messages");
                ProcessingResult::nak_all(raw_messages.len(), Some(e.to_string()))
            }
        };

        for idx in processing_result.ack {
            if let Some(msg) = raw_messages.get(idx) {
                if let Err(e) = msg.ack().await {
                    error!(error = %e, message_index = idx, "failed to acknowledge message");
                }
            } else {
                warn!(
                    message_index = idx,
                    batch_size = raw_messages.len(),
                    "invalid ack index in ProcessingResult"
                );
            }
        }

        for (idx, error_msg) in processing_result.nak {
            let Some(msg) = raw_messages.get(idx) else {
                warn!(
                    message_index = idx,
                    batch_size = raw_messages.len(),
                    "invalid nak index in ProcessingResult"
                );
                continue;
            };

            warn!(
                message_index = idx,
                subject = %msg.subject,
                error = %error_msg.as_deref().unwrap_or("unspecified"),
                "rejecting message"
            );

            if self.delivery_attempts_exhausted(msg) {
                self.dead_letter(msg).await;
                continue;
            }

            if let Err(e) = msg.ack_with(AckKind::Nak(None)).await {
                error!(error = %e, message_index = idx, "failed to reject message");
            }
        }

        Ok(())
    }

    fn delivery_attempts_exhausted(&self, msg: &Message) -> bool {
        match msg.info() {
            Ok(info) => info.delivered >= self.max_deliveries,
            Err(e) => {
                // No delivery metadata: keep redelivering rather than
                // risking message loss.
                warn!(error = %e, "missing delivery info on message");
                false
            }
        }
    }

    /// Copy the poisoned payload to the dead-letter stream and ack the
    /// original. If the copy fails the message is nak'd and retried on a
    /// later delivery.
    async fn dead_letter(&self, msg: &Message) {
        let subject = deadletter_subject(&self.stream_name);
        error!(
            original_subject = %msg.subject,
            deadletter_subject = %subject,
            max_deliveries = self.max_deliveries,
            "delivery attempts exhausted, dead-lettering message"
        );

        match self
            .deadletter_publisher
            .publish(subject, Bytes::copy_from_slice(&msg.payload))
            .await
        {
            Ok(()) => {
                if let Err(e) = msg.ack().await {
                    error!(error = %e, "failed to ack dead-lettered message");
                }
            }
            Err(e) => {
                error!(error = %e, "failed to publish to dead-letter stream");
                if let Err(e) = msg.ack_with(AckKind::Nak(None)).await {
                    error!(error = %e, "failed to reject message after dead-letter failure");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ack_all_marks_every_index() {
        let result = ProcessingResult::ack_all(3);
        assert_eq!(result.ack, vec![0, 1, 2]);
        assert!(result.nak.is_empty());
    }

    #[test]
    fn test_nak_all_carries_error_detail() {
        let result = ProcessingResult::nak_all(2, Some("boom".to_string()));
        assert!(result.ack.is_empty());
        assert_eq!(result.nak.len(), 2);
        assert!(result.nak.iter().all(|(_, e)| e.as_deref() == Some("boom")));
    }
}

// Note: the consumer loop itself needs real jetstream::Message values,
// which cannot be constructed without a broker connection; it is covered
// by the integration tests behind the `integration-tests` feature.
