//! The executor loop.
//!
//! Polls the work queue and handles one item at a time. For each item the
//! job is moved to `running`, the computation runs on a blocking thread
//! while its progress lines are relayed as `LOG` events, and the outcome is
//! written to the store and announced with a single `DONE` or `ERROR`
//! event. Nothing is retried.

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use automl_core::error::CoreError;
use automl_core::lifecycle::Transition;
use automl_db::models::work_item::WorkItem;
use automl_db::{DbError, JobStore, WorkQueue};
use automl_events::{JobPublisher, ProgressBus};
use automl_pipeline::{Computation, ComputationError, ComputationOutput, ProgressSink};
use tokio_util::sync::CancellationToken;

use crate::error::ExecutorError;

/// Default wait between polls of an empty queue.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

const START_MESSAGE: &str = "Training job started...";
const DONE_MESSAGE: &str = "Training complete!";
/// Recorded when a computation fails without saying why.
const FALLBACK_ERROR_DETAIL: &str = "Computation failed";

/// Runs queued jobs one at a time.
///
/// Several executors (in one process or many) may share the same queue;
/// the queue hands each item to exactly one of them.
pub struct Executor {
    store: Arc<dyn JobStore>,
    queue: Arc<dyn WorkQueue>,
    bus: Arc<dyn ProgressBus>,
    computation: Arc<dyn Computation>,
    poll_interval: Duration,
}

impl Executor {
    pub fn new(
        store: Arc<dyn JobStore>,
        queue: Arc<dyn WorkQueue>,
        bus: Arc<dyn ProgressBus>,
        computation: Arc<dyn Computation>,
    ) -> Self {
        Self {
            store,
            queue,
            bus,
            computation,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Run until the cancellation token is triggered.
    ///
    /// An item already being executed is finished before the loop exits.
    pub async fn run(&self, cancel: CancellationToken) {
        tracing::info!(
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            "Executor started",
        );

        while !cancel.is_cancelled() {
            let idle = match self.run_once().await {
                Ok(processed) => !processed,
                Err(e) => {
                    tracing::error!(error = %e, "Executor cycle failed");
                    true
                }
            };

            if idle {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(self.poll_interval) => {}
                }
            }
        }

        tracing::info!("Executor shutting down");
    }

    /// Take one item off the queue and execute it.
    ///
    /// Returns `false` when the queue was empty.
    pub async fn run_once(&self) -> Result<bool, ExecutorError> {
        let Some(item) = self.queue.dequeue().await? else {
            return Ok(false);
        };
        self.execute(item).await?;
        Ok(true)
    }

    /// Execute one work item to completion.
    ///
    /// Only a store failure while starting the job is returned as an
    /// error; every later failure is recorded on the job instead.
    pub async fn execute(&self, item: WorkItem) -> Result<(), ExecutorError> {
        let job_id = item.job_id;

        match self.store.update(job_id, &Transition::Start).await {
            Ok(_) => {}
            Err(DbError::Core(CoreError::NotFound { .. })) => {
                tracing::warn!(%job_id, "Work item has no job record, skipping");
                return Ok(());
            }
            Err(DbError::Core(e @ CoreError::InvalidTransition { .. })) => {
                tracing::warn!(%job_id, error = %e, "Job already started, skipping");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        }
        tracing::info!(%job_id, input_reference = %item.input_reference, "Job started");

        let mut publisher = JobPublisher::new(Arc::clone(&self.bus), job_id);
        self.publish_log(&mut publisher, START_MESSAGE).await;

        match self.compute(&item, &mut publisher).await {
            Ok(output) => self.finish_done(publisher, output).await,
            Err(e) => self.finish_error(publisher, e.0).await,
        }

        Ok(())
    }

    /// Run the computation on a blocking thread, relaying each progress
    /// line as a `LOG` event in emission order.
    async fn compute(
        &self,
        item: &WorkItem,
        publisher: &mut JobPublisher,
    ) -> Result<ComputationOutput, ComputationError> {
        let (sink, mut lines) = ProgressSink::channel();
        let computation = Arc::clone(&self.computation);
        let input_reference = item.input_reference.clone();
        let target_spec = item.target_spec.clone();

        let task = tokio::task::spawn_blocking(move || {
            computation.compute(&input_reference, &target_spec, &sink)
        });

        // Ends once the closure above returns and drops the sink.
        while let Some(line) = lines.recv().await {
            self.publish_log(publisher, line).await;
        }

        match task.await {
            Ok(result) => result,
            Err(e) if e.is_panic() => Err(ComputationError::new(format!(
                "Computation panicked: {}",
                panic_message(e.into_panic().as_ref())
            ))),
            Err(e) => Err(ComputationError::new(format!(
                "Computation did not finish: {e}"
            ))),
        }
    }

    async fn finish_done(&self, publisher: JobPublisher, output: ComputationOutput) {
        let job_id = publisher.job_id();
        let transition = Transition::Complete {
            result: output.payload.clone(),
            problem_kind: output.problem_kind,
        };

        match self.store.update(job_id, &transition).await {
            Ok(_) => {}
            Err(DbError::Core(CoreError::Validation(msg))) => {
                return self.finish_error(publisher, msg).await;
            }
            Err(e) => {
                tracing::error!(%job_id, error = %e, "Failed to record job result");
            }
        }
        tracing::info!(%job_id, "Job completed");

        if let Err(e) = publisher.done(DONE_MESSAGE, output.payload).await {
            tracing::warn!(%job_id, error = %e, "Failed to publish DONE event");
        }
    }

    async fn finish_error(&self, publisher: JobPublisher, detail: String) {
        let job_id = publisher.job_id();
        let detail = if detail.trim().is_empty() {
            FALLBACK_ERROR_DETAIL.to_string()
        } else {
            detail
        };
        tracing::warn!(%job_id, error = %detail, "Job failed");

        let transition = Transition::Fail {
            detail: detail.clone(),
        };
        if let Err(e) = self.store.update(job_id, &transition).await {
            tracing::error!(%job_id, error = %e, "Failed to record job failure");
        }

        if let Err(e) = publisher.error(detail).await {
            tracing::warn!(%job_id, error = %e, "Failed to publish ERROR event");
        }
    }

    async fn publish_log(&self, publisher: &mut JobPublisher, line: impl Into<String>) {
        if let Err(e) = publisher.log(line).await {
            tracing::warn!(job_id = %publisher.job_id(), error = %e, "Failed to publish LOG event");
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use assert_matches::assert_matches;
    use automl_core::problem::ProblemKind;
    use automl_core::status::JobStatus;
    use automl_core::types::new_job_id;
    use automl_db::models::job::Job;
    use automl_db::{MemoryJobStore, MemoryWorkQueue};
    use automl_core::types::JobId;
    use automl_events::{BusError, EventKind, LocalProgressBus, ProgressEvent, Subscription};
    use serde_json::json;

    use super::*;

    /// Scripted computation that records the calls it receives.
    enum Script {
        Succeed(Vec<&'static str>, serde_json::Value),
        Fail(Vec<&'static str>, &'static str),
        Panic,
    }

    struct ScriptedComputation {
        script: Script,
        calls: Mutex<Vec<(String, String)>>,
    }

    impl ScriptedComputation {
        fn new(script: Script) -> Arc<Self> {
            Arc::new(Self {
                script,
                calls: Mutex::new(Vec::new()),
            })
        }
    }

    impl Computation for ScriptedComputation {
        fn compute(
            &self,
            input_reference: &str,
            target_spec: &str,
            progress: &ProgressSink,
        ) -> Result<ComputationOutput, ComputationError> {
            self.calls
                .lock()
                .unwrap()
                .push((input_reference.into(), target_spec.into()));
            match &self.script {
                Script::Succeed(lines, payload) => {
                    lines.iter().for_each(|l| progress.emit(*l));
                    Ok(ComputationOutput {
                        problem_kind: Some(ProblemKind::Regression),
                        payload: payload.clone(),
                    })
                }
                Script::Fail(lines, message) => {
                    lines.iter().for_each(|l| progress.emit(*l));
                    Err(ComputationError::new(*message))
                }
                Script::Panic => panic!("boom"),
            }
        }
    }

    struct Harness {
        store: Arc<MemoryJobStore>,
        queue: Arc<MemoryWorkQueue>,
        bus: Arc<LocalProgressBus>,
        executor: Executor,
    }

    fn harness(computation: Arc<dyn Computation>) -> Harness {
        let store = Arc::new(MemoryJobStore::new());
        let queue = Arc::new(MemoryWorkQueue::new());
        let bus = Arc::new(LocalProgressBus::default());
        let executor = Executor::new(store.clone(), queue.clone(), bus.clone(), computation)
            .with_poll_interval(Duration::from_millis(10));
        Harness {
            store,
            queue,
            bus,
            executor,
        }
    }

    async fn submit(h: &Harness, input: &str, target: &str) -> WorkItem {
        let id = new_job_id();
        h.store
            .create(&Job::new_pending(id, input, target, chrono::Utc::now()))
            .await
            .unwrap();
        WorkItem {
            job_id: id,
            input_reference: input.into(),
            target_spec: target.into(),
        }
    }

    async fn drain(sub: &mut Subscription) -> Vec<ProgressEvent> {
        let mut events = Vec::new();
        while let Some(event) = sub.next_event().await {
            let event = event.unwrap();
            let terminal = event.is_terminal();
            events.push(event);
            if terminal {
                break;
            }
        }
        events
    }

    #[tokio::test]
    async fn successful_job_is_done_with_one_done_event() {
        let computation =
            ScriptedComputation::new(Script::Succeed(vec!["step 1", "step 2"], json!({"score": 0.9})));
        let h = harness(computation.clone());
        let item = submit(&h, "r1", "colA").await;
        let mut sub = h.bus.subscribe(item.job_id).await.unwrap();

        h.executor.execute(item.clone()).await.unwrap();

        let job = h.store.get(item.job_id).await.unwrap();
        assert_eq!(job.status().unwrap(), JobStatus::Done);
        assert_eq!(job.result_payload, Some(json!({"score": 0.9})));
        assert_eq!(job.problem_kind.as_deref(), Some("regression"));
        assert!(job.error_detail.is_none());

        let events = drain(&mut sub).await;
        let kinds: Vec<EventKind> = events.iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![EventKind::Log, EventKind::Log, EventKind::Log, EventKind::Done]
        );
        assert_eq!(events[0].message, START_MESSAGE);
        assert_eq!(events[1].message, "step 1");
        assert_eq!(events[2].message, "step 2");
        assert_eq!(events[3].payload, Some(json!({"score": 0.9})));

        assert_eq!(
            *computation.calls.lock().unwrap(),
            vec![("r1".to_string(), "colA".to_string())]
        );
    }

    #[tokio::test]
    async fn failed_job_is_error_with_one_error_event() {
        let computation = ScriptedComputation::new(Script::Fail(vec!["loading"], "bad column"));
        let h = harness(computation.clone());
        let item = submit(&h, "r1", "colA").await;
        let mut sub = h.bus.subscribe(item.job_id).await.unwrap();

        h.executor.execute(item.clone()).await.unwrap();

        let job = h.store.get(item.job_id).await.unwrap();
        assert_eq!(job.status().unwrap(), JobStatus::Error);
        assert_eq!(job.error_detail.as_deref(), Some("bad column"));
        assert!(job.result_payload.is_none());

        let events = drain(&mut sub).await;
        let last = events.last().unwrap();
        assert_eq!(last.kind, EventKind::Error);
        assert_eq!(last.message, "bad column");
        assert_eq!(
            events.iter().filter(|e| e.is_terminal()).count(),
            1
        );

        // Not re-queued, not retried.
        assert!(h.queue.is_empty().await);
        assert_eq!(computation.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn blank_failure_detail_still_records_error() {
        let h = harness(ScriptedComputation::new(Script::Fail(vec![], "  ")));
        let item = submit(&h, "r1", "colA").await;
        let mut sub = h.bus.subscribe(item.job_id).await.unwrap();

        h.executor.execute(item.clone()).await.unwrap();

        let job = h.store.get(item.job_id).await.unwrap();
        assert_eq!(job.status().unwrap(), JobStatus::Error);
        assert_eq!(job.error_detail.as_deref(), Some(FALLBACK_ERROR_DETAIL));

        let events = drain(&mut sub).await;
        let last = events.last().unwrap();
        assert_eq!(last.kind, EventKind::Error);
        assert_eq!(last.message, FALLBACK_ERROR_DETAIL);
    }

    #[tokio::test]
    async fn panicking_computation_is_recorded_as_error() {
        let h = harness(ScriptedComputation::new(Script::Panic));
        let item = submit(&h, "r1", "colA").await;
        let mut sub = h.bus.subscribe(item.job_id).await.unwrap();

        h.executor.execute(item.clone()).await.unwrap();

        let job = h.store.get(item.job_id).await.unwrap();
        assert_eq!(job.status().unwrap(), JobStatus::Error);
        assert_eq!(job.error_detail.as_deref(), Some("Computation panicked: boom"));

        let events = drain(&mut sub).await;
        assert_eq!(events.last().unwrap().kind, EventKind::Error);
    }

    #[tokio::test]
    async fn null_result_is_recorded_as_error() {
        let h = harness(ScriptedComputation::new(Script::Succeed(
            vec![],
            serde_json::Value::Null,
        )));
        let item = submit(&h, "r1", "colA").await;

        h.executor.execute(item.clone()).await.unwrap();

        let job = h.store.get(item.job_id).await.unwrap();
        assert_eq!(job.status().unwrap(), JobStatus::Error);
        assert!(job.error_detail.is_some());
    }

    #[tokio::test]
    async fn missing_record_is_skipped_silently() {
        let computation = ScriptedComputation::new(Script::Succeed(vec![], json!({"ok": true})));
        let h = harness(computation.clone());
        let item = WorkItem {
            job_id: new_job_id(),
            input_reference: "r1".into(),
            target_spec: "colA".into(),
        };

        h.executor.execute(item.clone()).await.unwrap();

        assert!(computation.calls.lock().unwrap().is_empty());
        assert_matches!(
            h.store.get(item.job_id).await,
            Err(DbError::Core(CoreError::NotFound { .. }))
        );
    }

    #[tokio::test]
    async fn already_started_job_is_not_run_twice() {
        let computation = ScriptedComputation::new(Script::Succeed(vec![], json!({"ok": true})));
        let h = harness(computation.clone());
        let item = submit(&h, "r1", "colA").await;

        h.executor.execute(item.clone()).await.unwrap();
        h.executor.execute(item.clone()).await.unwrap();

        assert_eq!(computation.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn late_subscriber_sees_nothing() {
        let h = harness(ScriptedComputation::new(Script::Succeed(
            vec!["a"],
            json!({"score": 1}),
        )));
        let item = submit(&h, "r1", "colA").await;
        h.executor.execute(item.clone()).await.unwrap();

        let mut sub = h.bus.subscribe(item.job_id).await.unwrap();
        let next = tokio::time::timeout(Duration::from_millis(50), sub.next_event()).await;
        assert!(next.is_err(), "late subscriber must not receive replayed events");
    }

    /// Forwards to a local bus but refuses frames above `max_frame_bytes`,
    /// the way `NOTIFY` refuses oversized payloads.
    struct FailingBus {
        inner: LocalProgressBus,
        max_frame_bytes: usize,
    }

    #[async_trait::async_trait]
    impl ProgressBus for FailingBus {
        async fn publish(&self, job_id: JobId, event: &ProgressEvent) -> Result<(), BusError> {
            if event.to_frame()?.len() > self.max_frame_bytes {
                return Err(BusError::Transport("payload string too long".into()));
            }
            self.inner.publish(job_id, event).await
        }

        async fn subscribe(&self, job_id: JobId) -> Result<Subscription, BusError> {
            self.inner.subscribe(job_id).await
        }
    }

    fn harness_with_bus(computation: Arc<dyn Computation>, bus: Arc<FailingBus>) -> Harness {
        let mut h = harness(computation.clone());
        h.executor = Executor::new(h.store.clone(), h.queue.clone(), bus, computation);
        h
    }

    #[tokio::test]
    async fn oversized_result_still_ends_the_stream() {
        let matrix: Vec<u32> = (0..1000).collect();
        let payload = json!({"confusion_matrix": matrix});
        let bus = Arc::new(FailingBus {
            inner: LocalProgressBus::default(),
            max_frame_bytes: 500,
        });
        let h = harness_with_bus(
            ScriptedComputation::new(Script::Succeed(vec!["step 1"], payload.clone())),
            bus.clone(),
        );
        let item = submit(&h, "r1", "label").await;
        let mut sub = bus.subscribe(item.job_id).await.unwrap();

        h.executor.execute(item.clone()).await.unwrap();

        let job = h.store.get(item.job_id).await.unwrap();
        assert_eq!(job.status().unwrap(), JobStatus::Done);
        assert_eq!(job.result_payload, Some(payload));

        let events = drain(&mut sub).await;
        let kinds: Vec<EventKind> = events.iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![EventKind::Log, EventKind::Log, EventKind::Done]);
        assert!(events[2].payload.is_none());
    }

    #[tokio::test]
    async fn oversized_log_is_skipped_and_job_finishes() {
        let long_line: &'static str = Box::leak("x".repeat(2000).into_boxed_str());
        let bus = Arc::new(FailingBus {
            inner: LocalProgressBus::default(),
            max_frame_bytes: 500,
        });
        let h = harness_with_bus(
            ScriptedComputation::new(Script::Fail(vec![long_line, "short"], "bad column")),
            bus.clone(),
        );
        let item = submit(&h, "r1", "colA").await;
        let mut sub = bus.subscribe(item.job_id).await.unwrap();

        h.executor.execute(item.clone()).await.unwrap();

        let job = h.store.get(item.job_id).await.unwrap();
        assert_eq!(job.status().unwrap(), JobStatus::Error);
        assert_eq!(job.error_detail.as_deref(), Some("bad column"));

        let events = drain(&mut sub).await;
        let messages: Vec<&str> = events.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec![START_MESSAGE, "short", "bad column"]);
        assert!(events.last().unwrap().is_terminal());
    }

    #[tokio::test]
    async fn unreachable_bus_does_not_block_the_record() {
        let bus = Arc::new(FailingBus {
            inner: LocalProgressBus::default(),
            max_frame_bytes: 0,
        });
        let h = harness_with_bus(
            ScriptedComputation::new(Script::Succeed(vec!["step 1"], json!({"score": 0.9}))),
            bus,
        );
        let item = submit(&h, "r1", "colA").await;

        h.executor.execute(item.clone()).await.unwrap();

        let job = h.store.get(item.job_id).await.unwrap();
        assert_eq!(job.status().unwrap(), JobStatus::Done);
        assert_eq!(job.result_payload, Some(json!({"score": 0.9})));
    }

    #[tokio::test]
    async fn run_once_reports_empty_queue() {
        let h = harness(ScriptedComputation::new(Script::Succeed(vec![], json!({"ok": true}))));
        assert!(!h.executor.run_once().await.unwrap());
    }

    #[tokio::test]
    async fn run_loop_drains_queue_until_cancelled() {
        let h = harness(ScriptedComputation::new(Script::Succeed(vec![], json!({"n": 1}))));
        let first = submit(&h, "a.csv", "y").await;
        let second = submit(&h, "b.csv", "y").await;
        h.queue.enqueue(&first).await.unwrap();
        h.queue.enqueue(&second).await.unwrap();

        let Harness {
            store, executor, ..
        } = h;
        let cancel = CancellationToken::new();
        let loop_cancel = cancel.clone();
        let handle = tokio::spawn(async move { executor.run(loop_cancel).await });

        for _ in 0..100 {
            let a = store.get(first.job_id).await.unwrap().status().unwrap();
            let b = store.get(second.job_id).await.unwrap().status().unwrap();
            if a == JobStatus::Done && b == JobStatus::Done {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        cancel.cancel();
        handle.await.unwrap();
        assert_eq!(
            store.get(second.job_id).await.unwrap().status().unwrap(),
            JobStatus::Done
        );
    }
}
