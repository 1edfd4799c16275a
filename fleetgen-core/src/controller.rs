//! Start/stop/status state machine for the generation loop.
//!
//! ## States
//!
//! - `STOPPED` (initial): no loop task exists.
//! - `RUNNING`: exactly one loop task exists and owns the timer.
//!
//! Start and Stop are serialized by one async mutex that guards the
//! check-then-act sequence and the cancellation handle, so concurrent Start
//! calls can never spawn two loops. Redundant calls are successful no-ops.
//! Every Start and Stop, redundant or not, pushes a status notification to the
//! view-update channel.
//!
//! ## Cancellation boundary
//!
//! The loop waits on either the next tick or the cancellation signal and
//! prefers the signal when both are ready. It re-checks the signal after
//! waking, so no tick begins once cancellation has been observed. A tick never
//! awaits, so a tick that already began finishes before the loop can exit.
//! Stop returns only after the loop task and its bus forwarder have finished:
//! once Stop returns nothing more is published on either channel.
//!
//! Teardown runs on its own task that holds the transition lock, so it
//! completes even if the caller of Stop goes away mid-call.

use std::sync::Arc;

use tokio::sync::{broadcast, watch, Mutex, OwnedMutexGuard};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

use crate::bus::BusPublisher;
use crate::config::GeneratorConfig;
use crate::error::ConfigError;
use crate::factory::RecordFactory;
use crate::publisher::{
    EventPublisher, LogErrorSink, PublishErrorSink, PublisherStats, RecordOutbox,
};
use crate::status::{GenerationState, StatusQuery};
use crate::types::{ControlResponse, StatusSnapshot, ViewEvent};

// ─── Controller ───────────────────────────────────────────────

pub struct GenerationController {
    config: GeneratorConfig,
    state: Arc<GenerationState>,
    status: StatusQuery,
    publisher: Arc<EventPublisher>,
    slot: Arc<Mutex<LoopSlot>>,
}

/// Everything guarded by the transition lock.
struct LoopSlot {
    /// Present iff the generator is running.
    active: Option<ActiveRun>,
    /// Random source parked here between runs so a seeded generator keeps
    /// one sequence across Start/Stop cycles.
    idle_factory: Option<RecordFactory>,
}

/// Cancellation handle of the running loop.
struct ActiveRun {
    run_id: Uuid,
    cancel_tx: watch::Sender<bool>,
    task: JoinHandle<RecordFactory>,
}

impl GenerationController {
    /// Controller whose publish failures are logged.
    pub fn new(config: GeneratorConfig, bus: Arc<dyn BusPublisher>) -> Result<Self, ConfigError> {
        Self::with_error_sink(config, bus, Arc::new(LogErrorSink))
    }

    pub fn with_error_sink(
        config: GeneratorConfig,
        bus: Arc<dyn BusPublisher>,
        errors: Arc<dyn PublishErrorSink>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let state = Arc::new(GenerationState::new());
        let publisher = Arc::new(EventPublisher::new(bus, &config, errors));
        let factory = RecordFactory::from_seed(config.seed);

        info!(
            tick_ms = config.tick_interval.as_millis() as u64,
            topic = %config.generated_topic,
            seeded = config.seed.is_some(),
            "Generation controller created"
        );

        Ok(Self {
            status: StatusQuery::new(state.clone()),
            state,
            publisher,
            slot: Arc::new(Mutex::new(LoopSlot {
                active: None,
                idle_factory: Some(factory),
            })),
            config,
        })
    }

    /// STOPPED → RUNNING, or a no-op when already running.
    pub async fn start(&self) -> ControlResponse {
        let mut slot = self.slot.lock().await;

        if let Some(run) = &slot.active {
            let total = self.state.generated_count();
            warn!(run_id = %run.run_id, generated_count = total, "Generator already running");
            self.publisher.publish_status(self.status.snapshot());
            return ControlResponse::ok(format!("Generator already running. total={total}"));
        }

        let factory = slot
            .idle_factory
            .take()
            .unwrap_or_else(|| RecordFactory::from_seed(self.config.seed));
        let run_id = Uuid::now_v7();
        let (cancel_tx, cancel_rx) = watch::channel(false);

        let generation_loop = GenerationLoop {
            run_id,
            config: self.config.clone(),
            state: self.state.clone(),
            publisher: self.publisher.clone(),
            factory,
        };
        let task = tokio::spawn(generation_loop.run(cancel_rx));

        slot.active = Some(ActiveRun {
            run_id,
            cancel_tx,
            task,
        });
        self.state.set_running(true);

        info!(
            run_id = %run_id,
            generated_count = self.state.generated_count(),
            "Generator started"
        );
        self.publisher.publish_status(self.status.snapshot());
        ControlResponse::ok("Generator started")
    }

    /// RUNNING → STOPPED, or a no-op when already stopped.
    pub async fn stop(&self) -> ControlResponse {
        let mut slot = Arc::clone(&self.slot).lock_owned().await;

        let Some(run) = slot.active.take() else {
            warn!("Stop requested but generator is not running");
            self.publisher.publish_status(self.status.snapshot());
            return ControlResponse::ok("Generator already stopped");
        };

        let total = self.retire(slot, run, "Generator stopped").await;
        ControlResponse::ok(format!("Generator stopped. total={total}"))
    }

    /// Service teardown: stop an active loop, if any.
    pub async fn shutdown(&self) {
        let mut slot = Arc::clone(&self.slot).lock_owned().await;
        if let Some(run) = slot.active.take() {
            self.retire(slot, run, "Generator shut down").await;
        }
    }

    /// Finish `run` on a detached task that keeps the transition lock until
    /// the loop has exited and the state reads STOPPED. Returns the final
    /// count.
    async fn retire(
        &self,
        mut slot: OwnedMutexGuard<LoopSlot>,
        run: ActiveRun,
        message: &'static str,
    ) -> u64 {
        let state = Arc::clone(&self.state);
        let status = self.status.clone();
        let publisher = Arc::clone(&self.publisher);

        let teardown = tokio::spawn(async move {
            let run_id = run.run_id;
            slot.idle_factory = run.finish().await;
            state.set_running(false);

            let total = state.generated_count();
            info!(run_id = %run_id, generated_count = total, "{message}");
            publisher.publish_status(status.snapshot());
            total
        });

        match teardown.await {
            Ok(total) => total,
            Err(e) => {
                error!(error = ?e, "Generator teardown failed");
                self.state.generated_count()
            }
        }
    }

    /// Current snapshot. Never waits on Start/Stop.
    pub fn status(&self) -> StatusSnapshot {
        self.status.snapshot()
    }

    pub fn subscribe_view(&self) -> broadcast::Receiver<ViewEvent> {
        self.publisher.subscribe_view()
    }

    pub fn publisher_stats(&self) -> PublisherStats {
        self.publisher.stats()
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Identifier of the running generation loop, used for log correlation.
    pub async fn active_run_id(&self) -> Option<Uuid> {
        self.slot.lock().await.active.as_ref().map(|run| run.run_id)
    }
}

impl ActiveRun {
    /// Signal cancellation and wait for the loop to exit.
    ///
    /// Returns the loop's random source, or `None` if the loop panicked.
    async fn finish(self) -> Option<RecordFactory> {
        let _ = self.cancel_tx.send(true);
        match self.task.await {
            Ok(factory) => Some(factory),
            Err(e) => {
                error!(run_id = %self.run_id, error = ?e, "Generation loop panicked");
                None
            }
        }
    }
}

// ─── Loop ─────────────────────────────────────────────────────

struct GenerationLoop {
    run_id: Uuid,
    config: GeneratorConfig,
    state: Arc<GenerationState>,
    publisher: Arc<EventPublisher>,
    factory: RecordFactory,
}

impl GenerationLoop {
    /// Tick until cancelled (or the controller is dropped), then drain the
    /// bus outbox. Hands the random source back to the controller.
    async fn run(mut self, mut cancel_rx: watch::Receiver<bool>) -> RecordFactory {
        let period = self.config.tick_interval;
        let outbox = self.publisher.open_outbox(self.config.outbox_buffer_size);

        // First tick one period after Start
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        debug!(run_id = %self.run_id, "Generation loop running");

        loop {
            tokio::select! {
                biased;
                changed = cancel_rx.changed() => {
                    if changed.is_err() || *cancel_rx.borrow() {
                        break;
                    }
                    continue;
                }
                _ = ticker.tick() => {}
            }

            if *cancel_rx.borrow() {
                break;
            }
            self.tick(&outbox);
        }

        outbox.close(self.publisher.publish_timeout()).await;

        debug!(
            run_id = %self.run_id,
            generated_count = self.state.generated_count(),
            "Generation loop exited"
        );
        self.factory
    }

    fn tick(&mut self, outbox: &RecordOutbox) {
        let envelope = self.factory.next_envelope();
        trace!(run_id = %self.run_id, identifier = %envelope.identifier, "Record generated");
        outbox.publish_record(envelope);
        self.state.record_tick();
    }
}
