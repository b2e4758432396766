//! The mention worker: a resilient event loop around the response pipeline.
//!
//! The loop moves between four states:
//!
//! ```text
//!            mention              Ok
//!   Idle ───────────► Processing ────► (cycle delay) ──► Idle
//!    │  ▲                 │ Err
//!    │  └── (backoff) ◄───┘
//!    │        Backoff ◄──── wait failure
//!    └──────► Shutdown ◄── interrupt (Idle, Backoff, delays)
//! ```
//!
//! Processing is never interrupted. The shutdown signal is looked at again
//! once the pipeline has returned.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use postwright_config::LoopConfig;
use postwright_core::bus::{Mention, MessageBus};
use postwright_core::error::Error;
use tracing::{debug, error, info, warn};

use crate::pipeline::MentionHandler;

/// Why the worker stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WorkerExit {
    /// The shutdown signal fired.
    #[default]
    Shutdown,
    /// Too many cycles failed in a row.
    FailureLimit { failures: u32 },
}

/// Counters collected over one `run`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerReport {
    /// Mentions taken into processing
    pub cycles_started: u64,
    /// Mentions answered successfully
    pub cycles_completed: u64,
    /// Mentions whose processing failed
    pub cycles_failed: u64,
    /// Times the loop entered Backoff, including bus wait failures
    pub backoffs: u64,
    pub exit: WorkerExit,
}

enum State {
    Idle,
    Processing(Mention),
    Backoff(Error),
    Shutdown,
}

impl State {
    fn name(&self) -> &'static str {
        match self {
            State::Idle => "idle",
            State::Processing(_) => "processing",
            State::Backoff(_) => "backoff",
            State::Shutdown => "shutdown",
        }
    }
}

/// Waits for mentions and hands each one to a [`MentionHandler`], strictly
/// one at a time.
pub struct Worker {
    bus: Arc<dyn MessageBus>,
    handler: Arc<dyn MentionHandler>,
    config: LoopConfig,
}

impl Worker {
    pub fn new(bus: Arc<dyn MessageBus>, handler: Arc<dyn MentionHandler>, config: LoopConfig) -> Self {
        Self { bus, handler, config }
    }

    /// Run until `shutdown` resolves or the failure cap is hit.
    ///
    /// Generation, format, and delivery failures never end the loop on their
    /// own; they are logged and followed by the backoff delay.
    pub async fn run<F>(&self, shutdown: F) -> WorkerReport
    where
        F: Future<Output = ()> + Send,
    {
        tokio::pin!(shutdown);

        let mut report = WorkerReport::default();
        let mut consecutive_failures: u32 = 0;
        let mut state = State::Idle;

        info!(
            bus = self.bus.name(),
            backoff_secs = self.config.backoff_secs,
            cycle_delay_secs = self.config.cycle_delay_secs,
            max_failures = ?self.config.max_consecutive_failures,
            "Worker started"
        );

        loop {
            let from = state.name();
            state = match state {
                State::Idle => {
                    tokio::select! {
                        biased;
                        _ = &mut shutdown => State::Shutdown,
                        waited = self.bus.wait_for_mention() => match waited {
                            Ok(mention) => State::Processing(mention),
                            Err(e) => State::Backoff(Error::Delivery(e)),
                        },
                    }
                }

                State::Processing(mention) => {
                    report.cycles_started += 1;
                    info!(
                        cycle = report.cycles_started,
                        thread_id = %mention.thread_id,
                        sender_id = %mention.sender_id,
                        "cycle started"
                    );

                    let started = Instant::now();
                    match self.handler.handle(mention).await {
                        Ok(()) => {
                            report.cycles_completed += 1;
                            consecutive_failures = 0;
                            info!(
                                cycle = report.cycles_started,
                                elapsed_ms = started.elapsed().as_millis() as u64,
                                "cycle completed"
                            );

                            tokio::select! {
                                biased;
                                _ = &mut shutdown => State::Shutdown,
                                _ = tokio::time::sleep(self.config.cycle_delay()) => State::Idle,
                            }
                        }
                        Err(e) => {
                            report.cycles_failed += 1;
                            State::Backoff(e)
                        }
                    }
                }

                State::Backoff(e) => {
                    report.backoffs += 1;
                    consecutive_failures += 1;
                    error!(kind = e.kind(), consecutive_failures, "error in cycle: {e}");

                    if let Some(limit) = self.config.max_consecutive_failures
                        && consecutive_failures >= limit
                    {
                        warn!(failures = consecutive_failures, "Consecutive failure limit reached, stopping");
                        report.exit = WorkerExit::FailureLimit {
                            failures: consecutive_failures,
                        };
                        break;
                    }

                    tokio::select! {
                        biased;
                        _ = &mut shutdown => State::Shutdown,
                        _ = tokio::time::sleep(self.config.backoff()) => State::Idle,
                    }
                }

                State::Shutdown => {
                    report.exit = WorkerExit::Shutdown;
                    break;
                }
            };
            debug!(from, to = state.name(), "Worker state transition");
        }

        info!(
            completed = report.cycles_completed,
            failed = report.cycles_failed,
            backoffs = report.backoffs,
            exit = ?report.exit,
            "Worker stopped"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::ResponsePipeline;
    use crate::testing::{EventLog, ScriptedBus, ScriptedProvider, sample_reply};
    use postwright_core::error::{BusError, ProviderError};
    use std::sync::Mutex;
    use std::time::Duration;

    fn config(max_failures: Option<u32>) -> LoopConfig {
        LoopConfig {
            backoff_secs: 5,
            cycle_delay_secs: 1,
            max_consecutive_failures: max_failures,
        }
    }

    fn worker(provider: Arc<ScriptedProvider>, bus: Arc<ScriptedBus>, config: LoopConfig) -> Worker {
        let pipeline = ResponsePipeline::new(provider, bus.clone(), "test-model");
        Worker::new(bus, Arc::new(pipeline), config)
    }

    fn mention(thread: &str, body: &str) -> Result<Mention, BusError> {
        Ok(Mention::new(thread, "planner", body))
    }

    fn network_error() -> Result<String, ProviderError> {
        Err(ProviderError::Network("connection reset".into()))
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_after_repeated_generator_failures() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            network_error(),
            network_error(),
            network_error(),
            Ok(sample_reply()),
        ]));
        let bus = Arc::new(ScriptedBus::new(vec![
            mention("t-1", "one"),
            mention("t-2", "two"),
            mention("t-3", "three"),
            mention("t-4", "four"),
        ]));
        let drained = bus.drained();

        let started = tokio::time::Instant::now();
        let report = worker(provider, bus.clone(), config(None))
            .run(async move { drained.notified().await })
            .await;

        assert_eq!(report.backoffs, 3);
        assert_eq!(report.cycles_failed, 3);
        assert_eq!(report.cycles_completed, 1);
        assert_eq!(report.cycles_started, 4);
        assert_eq!(report.exit, WorkerExit::Shutdown);

        let sent = bus.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].thread_id, "t-4");

        // Three backoffs of 5s plus one cycle delay of 1s.
        assert!(started.elapsed() >= Duration::from_secs(16));
    }

    #[tokio::test(start_paused = true)]
    async fn interrupt_while_idle_exits_without_processing() {
        let provider = Arc::new(ScriptedProvider::new(vec![]));
        let bus = Arc::new(ScriptedBus::new(vec![]));
        let drained = bus.drained();

        let report = worker(provider.clone(), bus.clone(), config(None))
            .run(async move { drained.notified().await })
            .await;

        assert_eq!(report, WorkerReport::default());
        assert!(provider.requests().is_empty());
        assert!(bus.sent().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn interrupt_during_backoff_cuts_the_delay_short() {
        let provider = Arc::new(ScriptedProvider::new(vec![network_error()]));
        let bus = Arc::new(ScriptedBus::new(vec![mention("t-1", "one")]));

        let started = tokio::time::Instant::now();
        let report = worker(provider, bus, config(None))
            .run(tokio::time::sleep(Duration::from_secs(2)))
            .await;

        assert_eq!(report.backoffs, 1);
        assert_eq!(report.exit, WorkerExit::Shutdown);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn bus_wait_failure_backs_off_and_resumes() {
        let provider = Arc::new(ScriptedProvider::new(vec![Ok(sample_reply())]));
        let bus = Arc::new(ScriptedBus::new(vec![
            Err(BusError::ConnectionLost("sse dropped".into())),
            mention("t-1", "one"),
        ]));
        let drained = bus.drained();

        let report = worker(provider, bus.clone(), config(None))
            .run(async move { drained.notified().await })
            .await;

        assert_eq!(report.backoffs, 1);
        assert_eq!(report.cycles_failed, 0);
        assert_eq!(report.cycles_completed, 1);
        assert_eq!(bus.sent().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn replies_follow_arrival_order() {
        let log: EventLog = Arc::new(Mutex::new(Vec::new()));
        let provider = Arc::new(
            ScriptedProvider::new(vec![Ok(sample_reply()), Ok(sample_reply())]).with_log(log.clone()),
        );
        let bus = Arc::new(
            ScriptedBus::new(vec![mention("t-1", "first"), mention("t-2", "second")])
                .with_log(log.clone()),
        );
        let drained = bus.drained();

        worker(provider, bus, config(None))
            .run(async move { drained.notified().await })
            .await;

        assert_eq!(
            *log.lock().unwrap(),
            vec![
                "generate:first".to_string(),
                "send:t-1".to_string(),
                "generate:second".to_string(),
                "send:t-2".to_string(),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn delivery_failure_discards_batch_and_continues() {
        let provider = Arc::new(ScriptedProvider::new(vec![Ok(sample_reply()), Ok(sample_reply())]));
        let bus = Arc::new(
            ScriptedBus::new(vec![mention("t-1", "one"), mention("t-2", "two")]).failing_sends(1),
        );
        let drained = bus.drained();

        let report = worker(provider, bus.clone(), config(None))
            .run(async move { drained.notified().await })
            .await;

        assert_eq!(report.cycles_failed, 1);
        assert_eq!(report.cycles_completed, 1);
        let sent = bus.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].thread_id, "t-2");
    }

    /// Takes a while before replying, like a slow generator.
    struct SlowHandler {
        bus: Arc<ScriptedBus>,
        delay: Duration,
    }

    #[async_trait::async_trait]
    impl MentionHandler for SlowHandler {
        async fn handle(&self, mention: Mention) -> postwright_core::error::Result<()> {
            tokio::time::sleep(self.delay).await;
            self.bus
                .send_message(&mention.thread_id, &mention.sender_id, &sample_reply())
                .await?;
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn interrupt_during_processing_lets_the_cycle_finish() {
        let bus = Arc::new(ScriptedBus::new(vec![mention("t-1", "one")]));
        let handler = SlowHandler {
            bus: bus.clone(),
            delay: Duration::from_secs(3),
        };
        let worker = Worker::new(bus.clone(), Arc::new(handler), config(None));

        let started = tokio::time::Instant::now();
        let report = worker.run(tokio::time::sleep(Duration::from_secs(1))).await;

        assert_eq!(report.exit, WorkerExit::Shutdown);
        assert_eq!(report.cycles_completed, 1);
        let sent = bus.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].thread_id, "t-1");
        // Stopped right after the cycle, without sitting out the cycle delay.
        assert!(started.elapsed() >= Duration::from_secs(3));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn failure_cap_stops_the_loop() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            network_error(),
            network_error(),
            network_error(),
        ]));
        let bus = Arc::new(ScriptedBus::new(vec![
            mention("t-1", "one"),
            mention("t-2", "two"),
            mention("t-3", "three"),
        ]));

        let report = worker(provider, bus, config(Some(2)))
            .run(std::future::pending())
            .await;

        assert_eq!(report.exit, WorkerExit::FailureLimit { failures: 2 });
        assert_eq!(report.cycles_started, 2);
        assert_eq!(report.backoffs, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn success_resets_failure_count() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            network_error(),
            Ok(sample_reply()),
            network_error(),
        ]));
        let bus = Arc::new(ScriptedBus::new(vec![
            mention("t-1", "one"),
            mention("t-2", "two"),
            mention("t-3", "three"),
        ]));
        let drained = bus.drained();

        let report = worker(provider, bus, config(Some(2)))
            .run(async move { drained.notified().await })
            .await;

        assert_eq!(report.exit, WorkerExit::Shutdown);
        assert_eq!(report.cycles_failed, 2);
        assert_eq!(report.cycles_completed, 1);
    }
}
