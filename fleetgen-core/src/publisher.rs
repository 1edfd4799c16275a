//! Fan-out of generated records and status changes.
//!
//! Two independent, best-effort channels:
//!
//! - **Bus topic**: every record, in tick order, through a bounded per-run
//!   outbox drained by a forwarder task. The tick only ever calls `try_send`,
//!   so a slow or failing broker never stalls tick production. A full outbox
//!   drops the record.
//! - **View updates**: a broadcast channel carrying records and status
//!   snapshots to live subscribers. Sending never blocks; having no
//!   subscribers is not an error.
//!
//! Failures are counted and handed to a [`PublishErrorSink`]; nothing is
//! retried and nothing propagates to the caller.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;

use crate::bus::BusPublisher;
use crate::config::GeneratorConfig;
use crate::error::PublishError;
use crate::types::{StatusSnapshot, VehicleEnvelope, ViewEvent, BUS_EVENT_NAME};

// ─── Error sink ───────────────────────────────────────────────

/// Receives every per-record delivery failure.
pub trait PublishErrorSink: Send + Sync {
    fn publish_failed(&self, error: &PublishError);
}

/// Default sink: log and move on.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogErrorSink;

impl PublishErrorSink for LogErrorSink {
    fn publish_failed(&self, error: &PublishError) {
        tracing::warn!(error = %error, "Generated record not delivered");
    }
}

// ─── Stats ────────────────────────────────────────────────────

#[derive(Default)]
struct Counters {
    bus_published: AtomicU64,
    bus_failed: AtomicU64,
    bus_dropped: AtomicU64,
    view_sent: AtomicU64,
}

/// Delivery counters since the publisher was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublisherStats {
    /// Records accepted by the bus.
    pub bus_published: u64,
    /// Records the bus rejected, did not accept in time, or that were
    /// abandoned when a run's outbox closed.
    pub bus_failed: u64,
    /// Records dropped before reaching the bus because the outbox was full.
    pub bus_dropped: u64,
    /// View events handed to at least one live subscriber.
    pub view_sent: u64,
}

impl PublisherStats {
    /// Fraction of records that never reached the bus (0.0 to 1.0).
    pub fn loss_rate(&self) -> f64 {
        let lost = self.bus_failed + self.bus_dropped;
        let total = self.bus_published + lost;
        if total == 0 {
            0.0
        } else {
            lost as f64 / total as f64
        }
    }
}

// ─── Publisher ────────────────────────────────────────────────

pub struct EventPublisher {
    bus: Arc<dyn BusPublisher>,
    topic: String,
    publish_timeout: Duration,
    view_tx: broadcast::Sender<ViewEvent>,
    errors: Arc<dyn PublishErrorSink>,
    counters: Counters,
}

impl EventPublisher {
    pub fn new(
        bus: Arc<dyn BusPublisher>,
        config: &GeneratorConfig,
        errors: Arc<dyn PublishErrorSink>,
    ) -> Self {
        let (view_tx, _) = broadcast::channel(config.view_buffer_size.max(1));
        Self {
            bus,
            topic: config.generated_topic.clone(),
            publish_timeout: config.publish_timeout,
            view_tx,
            errors,
            counters: Counters::default(),
        }
    }

    /// New live subscriber of the view-update channel.
    pub fn subscribe_view(&self) -> broadcast::Receiver<ViewEvent> {
        self.view_tx.subscribe()
    }

    pub fn view_subscriber_count(&self) -> usize {
        self.view_tx.receiver_count()
    }

    /// Push a status notification to the view-update channel.
    pub fn publish_status(&self, snapshot: StatusSnapshot) {
        self.send_view(ViewEvent::GeneratorStatus(snapshot));
    }

    pub fn stats(&self) -> PublisherStats {
        PublisherStats {
            bus_published: self.counters.bus_published.load(Ordering::Relaxed),
            bus_failed: self.counters.bus_failed.load(Ordering::Relaxed),
            bus_dropped: self.counters.bus_dropped.load(Ordering::Relaxed),
            view_sent: self.counters.view_sent.load(Ordering::Relaxed),
        }
    }

    /// Open the bus outbox for one generation run.
    ///
    /// Spawns the forwarder task. Call [`RecordOutbox::close`] to drain it.
    pub fn open_outbox(self: &Arc<Self>, capacity: usize) -> RecordOutbox {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let (abandon_tx, abandon_rx) = watch::channel(false);
        let forwarder = tokio::spawn(Arc::clone(self).forward(rx, abandon_rx));
        RecordOutbox {
            tx,
            forwarder,
            abandon_tx,
            publisher: Arc::clone(self),
        }
    }

    /// Upper bound on a single bus publish; also the drain grace on stop.
    pub fn publish_timeout(&self) -> Duration {
        self.publish_timeout
    }

    fn send_view(&self, event: ViewEvent) {
        match self.view_tx.send(event) {
            Ok(receivers) => {
                self.counters.view_sent.fetch_add(1, Ordering::Relaxed);
                tracing::trace!(receivers, "view update sent");
            }
            Err(_) => {
                // No live subscribers
            }
        }
    }

    fn record_dropped(&self, error: PublishError) {
        self.counters.bus_dropped.fetch_add(1, Ordering::Relaxed);
        self.errors.publish_failed(&error);
    }

    fn record_failed(&self, error: PublishError) {
        self.counters.bus_failed.fetch_add(1, Ordering::Relaxed);
        self.errors.publish_failed(&error);
    }

    /// Publish queued records in order until the outbox closes. When told to
    /// abandon, the in-flight record and everything still queued are
    /// reported as failed instead.
    async fn forward(
        self: Arc<Self>,
        mut rx: mpsc::Receiver<VehicleEnvelope>,
        mut abandon: watch::Receiver<bool>,
    ) {
        loop {
            let envelope = tokio::select! {
                biased;
                _ = abandoned(&mut abandon) => break,
                next = rx.recv() => match next {
                    Some(envelope) => envelope,
                    None => {
                        tracing::debug!(topic = %self.topic, "bus forwarder drained");
                        return;
                    }
                },
            };

            let publish = tokio::time::timeout(
                self.publish_timeout,
                self.bus.publish(&self.topic, BUS_EVENT_NAME, &envelope),
            );
            let outcome = tokio::select! {
                biased;
                _ = abandoned(&mut abandon) => {
                    self.record_failed(PublishError::Abandoned {
                        identifier: envelope.identifier.clone(),
                    });
                    break;
                }
                outcome = publish => outcome,
            };

            match outcome {
                Ok(Ok(())) => {
                    self.counters.bus_published.fetch_add(1, Ordering::Relaxed);
                }
                Ok(Err(e)) => self.record_failed(e),
                Err(_) => self.record_failed(PublishError::Timeout {
                    topic: self.topic.clone(),
                    timeout: self.publish_timeout,
                }),
            }
        }

        rx.close();
        let mut abandoned_count = 0u64;
        while let Ok(envelope) = rx.try_recv() {
            self.record_failed(PublishError::Abandoned {
                identifier: envelope.identifier,
            });
            abandoned_count += 1;
        }
        tracing::debug!(topic = %self.topic, abandoned_count, "bus forwarder abandoned");
    }
}

/// Resolves once abandonment is requested or the outbox is gone.
async fn abandoned(rx: &mut watch::Receiver<bool>) {
    let _ = rx.wait_for(|abandon| *abandon).await;
}

/// Per-run handle the tick publishes through.
pub struct RecordOutbox {
    tx: mpsc::Sender<VehicleEnvelope>,
    forwarder: JoinHandle<()>,
    abandon_tx: watch::Sender<bool>,
    publisher: Arc<EventPublisher>,
}

impl RecordOutbox {
    /// Fan one record out to both channels. Never blocks, never fails.
    pub fn publish_record(&self, envelope: VehicleEnvelope) {
        self.publisher
            .send_view(ViewEvent::GeneratorVehicleGenerated(envelope.clone()));

        match self.tx.try_send(envelope) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(envelope)) => {
                self.publisher.record_dropped(PublishError::OutboxFull {
                    identifier: envelope.identifier,
                });
            }
            Err(mpsc::error::TrySendError::Closed(envelope)) => {
                self.publisher.record_dropped(PublishError::OutboxClosed {
                    identifier: envelope.identifier,
                });
            }
        }
    }

    /// Records queued but not yet handed to the bus.
    pub fn pending(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    /// Stop accepting records and let the forwarder drain for up to `grace`.
    ///
    /// Whatever is still undelivered after `grace` is reported to the error
    /// sink as abandoned. Returns once the forwarder has exited.
    pub async fn close(self, grace: Duration) {
        let RecordOutbox {
            tx,
            mut forwarder,
            abandon_tx,
            ..
        } = self;
        let pending = tx.max_capacity() - tx.capacity();
        drop(tx);

        let joined = match tokio::time::timeout(grace, &mut forwarder).await {
            Ok(joined) => joined,
            Err(_) => {
                tracing::warn!(
                    grace_ms = grace.as_millis() as u64,
                    pending,
                    "Bus forwarder did not drain in time, abandoning queued records"
                );
                let _ = abandon_tx.send(true);
                forwarder.await
            }
        };
        if let Err(e) = joined {
            tracing::error!(error = ?e, "Bus forwarder failed");
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Sink that remembers every failure.
    #[derive(Default)]
    pub struct RecordingSink {
        pub errors: Mutex<Vec<String>>,
    }

    impl RecordingSink {
        pub fn count(&self) -> usize {
            self.errors.lock().unwrap().len()
        }
    }

    impl PublishErrorSink for RecordingSink {
        fn publish_failed(&self, error: &PublishError) {
            self.errors.lock().unwrap().push(error.to_string());
        }
    }

    /// Bus that rejects everything.
    pub struct FailingBus;

    #[async_trait]
    impl BusPublisher for FailingBus {
        async fn publish(
            &self,
            topic: &str,
            _event_name: &str,
            _envelope: &VehicleEnvelope,
        ) -> Result<(), PublishError> {
            Err(PublishError::Rejected {
                topic: topic.to_string(),
                reason: "broker unreachable".to_string(),
            })
        }
    }

    /// Bus whose publish panics, taking the forwarder down with it.
    pub struct PanickingBus;

    #[async_trait]
    impl BusPublisher for PanickingBus {
        async fn publish(
            &self,
            _topic: &str,
            _event_name: &str,
            _envelope: &VehicleEnvelope,
        ) -> Result<(), PublishError> {
            panic!("broker client crashed");
        }
    }

    /// Bus that never answers.
    pub struct StalledBus;

    #[async_trait]
    impl BusPublisher for StalledBus {
        async fn publish(
            &self,
            _topic: &str,
            _event_name: &str,
            _envelope: &VehicleEnvelope,
        ) -> Result<(), PublishError> {
            std::future::pending::<()>().await;
            Ok(())
        }
    }
}
