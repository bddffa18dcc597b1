use std::future::Future;
use std::time::Duration;

use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::Message;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use serde::Serialize;

use crate::error::TransportError;

// ===== Channel boundary =====

/// Producer half of the channel: delivers one ordered batch of serialized
/// messages.
pub trait EventSink {
    fn send_batch(
        &self,
        payloads: &[String],
    ) -> impl Future<Output = Result<(), TransportError>> + Send;
}

/// Consumer half: one serialized message per call, in send order per
/// producer.
pub trait EventSource {
    fn recv(&mut self) -> impl Future<Output = Result<String, TransportError>> + Send;
}

// ===== Kafka implementations =====

/// Owns its producer handle exclusively; never shared across components.
pub struct KafkaSink {
    producer: FutureProducer,
    topic: String,
}

impl KafkaSink {
    pub fn connect(brokers: &str, topic: &str) -> Result<Self, TransportError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .create()
            .map_err(|err| TransportError::Connect(err.to_string()))?;

        Ok(Self {
            producer,
            topic: topic.to_string(),
        })
    }
}

impl EventSink for KafkaSink {
    async fn send_batch(&self, payloads: &[String]) -> Result<(), TransportError> {
        for payload in payloads {
            self.producer
                .send(
                    FutureRecord::<(), String>::to(&self.topic).payload(payload),
                    Timeout::After(Duration::from_secs(0)),
                )
                .await
                .map_err(|(err, _)| TransportError::SendFailed(err.to_string()))?;
        }
        Ok(())
    }
}

pub struct KafkaSource {
    consumer: StreamConsumer,
}

impl KafkaSource {
    pub fn connect(brokers: &str, group_id: &str, topic: &str) -> Result<Self, TransportError> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("group.id", group_id)
            .set("enable.auto.commit", "true")
            .set("auto.offset.reset", "latest")
            .create()
            .map_err(|err| TransportError::Connect(err.to_string()))?;
        consumer
            .subscribe(&[topic])
            .map_err(|err| TransportError::Connect(err.to_string()))?;

        Ok(Self { consumer })
    }
}

impl EventSource for KafkaSource {
    async fn recv(&mut self) -> Result<String, TransportError> {
        let message = self
            .consumer
            .recv()
            .await
            .map_err(|err| TransportError::ReceiveFailed(err.to_string()))?;
        let payload = message
            .payload()
            .ok_or_else(|| TransportError::ReceiveFailed("empty payload".to_string()))?;
        String::from_utf8(payload.to_vec())
            .map_err(|err| TransportError::ReceiveFailed(err.to_string()))
    }
}

// ===== Batch publisher =====

pub const SEND_RETRY_LIMIT: u32 = 3;
const RETRY_BACKOFF: Duration = Duration::from_millis(500);

/// Packs serialized readings into size-bounded batches for the channel.
/// Order is preserved; nothing is dropped. A single payload larger than
/// the capacity is a configuration fault, not retried.
pub struct BatchPublisher<S> {
    sink: S,
    max_batch_bytes: usize,
}

impl<S: EventSink> BatchPublisher<S> {
    pub fn new(sink: S, max_batch_bytes: usize) -> Self {
        Self {
            sink,
            max_batch_bytes,
        }
    }

    /// Serialize and send every reading; returns the number of batches
    /// flushed.
    pub async fn publish<T: Serialize>(&self, readings: &[T]) -> Result<usize, TransportError> {
        let mut batch: Vec<String> = Vec::new();
        let mut batch_bytes = 0usize;
        let mut flushed = 0usize;

        for reading in readings {
            let payload = serde_json::to_string(reading)?;
            if payload.len() > self.max_batch_bytes {
                return Err(TransportError::OversizedRecord {
                    size: payload.len(),
                    capacity: self.max_batch_bytes,
                });
            }

            // Adding this payload would overflow the batch: flush first,
            // then start a new batch with it.
            if batch_bytes + payload.len() > self.max_batch_bytes && !batch.is_empty() {
                self.flush(&batch).await?;
                flushed += 1;
                batch.clear();
                batch_bytes = 0;
            }

            batch_bytes += payload.len();
            batch.push(payload);
        }

        if !batch.is_empty() {
            self.flush(&batch).await?;
            flushed += 1;
        }
        Ok(flushed)
    }

    async fn flush(&self, batch: &[String]) -> Result<(), TransportError> {
        let mut attempt = 0;
        loop {
            match self.sink.send_batch(batch).await {
                Ok(()) => {
                    log::debug!("flushed batch of {} readings", batch.len());
                    return Ok(());
                }
                Err(err) if err.is_retryable() && attempt + 1 < SEND_RETRY_LIMIT => {
                    attempt += 1;
                    let backoff = RETRY_BACKOFF * 2u32.pow(attempt - 1);
                    log::warn!(
                        "batch send failed (attempt {attempt}/{SEND_RETRY_LIMIT}), retrying in {backoff:?}: {err}"
                    );
                    tokio::time::sleep(backoff).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct RecordingSink {
        batches: Arc<Mutex<Vec<Vec<String>>>>,
    }

    impl RecordingSink {
        fn batches(&self) -> Vec<Vec<String>> {
            self.batches.lock().unwrap().clone()
        }
    }

    impl EventSink for RecordingSink {
        async fn send_batch(&self, payloads: &[String]) -> Result<(), TransportError> {
            self.batches.lock().unwrap().push(payloads.to_vec());
            Ok(())
        }
    }

    /// Fails the first `failures` sends with a retryable error.
    #[derive(Clone)]
    struct FlakySink {
        failures: Arc<Mutex<u32>>,
        inner: RecordingSink,
    }

    impl EventSink for FlakySink {
        async fn send_batch(&self, payloads: &[String]) -> Result<(), TransportError> {
            {
                let mut failures = self.failures.lock().unwrap();
                if *failures > 0 {
                    *failures -= 1;
                    return Err(TransportError::SendFailed("broker unavailable".to_string()));
                }
            }
            self.inner.send_batch(payloads).await
        }
    }

    // Each item serializes to the 7-byte JSON string "\"it-0N\"", so a
    // 24-byte capacity fits exactly 3 items.
    fn ten_items() -> Vec<String> {
        (0..10).map(|i| format!("it-{i:02}")).collect()
    }

    #[tokio::test]
    async fn splits_into_bounded_batches_without_loss() {
        let sink = RecordingSink::default();
        let publisher = BatchPublisher::new(sink.clone(), 24);

        let items = ten_items();
        let flushed = publisher.publish(&items).await.unwrap();

        let batches = sink.batches();
        assert_eq!(flushed, 4);
        assert_eq!(
            batches.iter().map(Vec::len).collect::<Vec<_>>(),
            vec![3, 3, 3, 1]
        );

        // No duplication, no drops, no reordering.
        let recovered: Vec<String> = batches
            .concat()
            .iter()
            .map(|payload| serde_json::from_str::<String>(payload).unwrap())
            .collect();
        assert_eq!(recovered, items);
    }

    #[tokio::test]
    async fn everything_fits_in_one_batch_when_capacity_allows() {
        let sink = RecordingSink::default();
        let publisher = BatchPublisher::new(sink.clone(), 4096);
        let flushed = publisher.publish(&ten_items()).await.unwrap();
        assert_eq!(flushed, 1);
        assert_eq!(sink.batches().len(), 1);
    }

    #[tokio::test]
    async fn empty_input_sends_nothing() {
        let sink = RecordingSink::default();
        let publisher = BatchPublisher::new(sink.clone(), 64);
        let flushed = publisher.publish::<String>(&[]).await.unwrap();
        assert_eq!(flushed, 0);
        assert!(sink.batches().is_empty());
    }

    #[tokio::test]
    async fn oversized_single_payload_is_fatal() {
        let sink = RecordingSink::default();
        let publisher = BatchPublisher::new(sink.clone(), 4);
        let result = publisher.publish(&["way too large".to_string()]).await;
        assert!(matches!(
            result,
            Err(TransportError::OversizedRecord { capacity: 4, .. })
        ));
        assert!(sink.batches().is_empty());
    }

    #[tokio::test]
    async fn retryable_failures_back_off_then_succeed() {
        let sink = FlakySink {
            failures: Arc::new(Mutex::new(2)),
            inner: RecordingSink::default(),
        };
        let publisher = BatchPublisher::new(sink.clone(), 4096);
        publisher.publish(&["ping".to_string()]).await.unwrap();
        assert_eq!(sink.inner.batches().len(), 1);
    }

    #[tokio::test]
    async fn retry_budget_is_bounded() {
        let sink = FlakySink {
            failures: Arc::new(Mutex::new(u32::MAX)),
            inner: RecordingSink::default(),
        };
        let publisher = BatchPublisher::new(sink.clone(), 4096);
        let result = publisher.publish(&["ping".to_string()]).await;
        assert!(matches!(result, Err(TransportError::SendFailed(_))));
        assert!(sink.inner.batches().is_empty());
    }
}
