//! Canvas session: the single owner of a graph and its execution tracking.
//!
//! `CanvasSession` is the central orchestrator:
//! 1. Builds the graph for the selected workflow.
//! 2. Exposes the graph for interactive mutation.
//! 3. Starts executions, polls their status, and applies snapshots in
//!    receipt order, discarding replies from superseded attempts.
//! 4. Schedules edge pulses and the post-execution cool-down on its own
//!    timer queue, all of which are released on teardown.
//!
//! Service calls run on spawned tokio tasks and report back over a channel;
//! every graph mutation happens on the session owner's task.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use client::{
    ClientError, ExecutionService, ExecutionSnapshot, ExecutionStatus, WorkflowDefinition,
};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::graph::{build_graph, WorkflowGraph};
use crate::layout::{LayeredLayout, LayoutStrategy};
use crate::poller::{FailureReason, Generation, Poller, PollerConfig, PollerState, Transition};
use crate::status::{map_snapshot, PulseConfig};
use crate::timer::{TimerHandle, TimerQueue};
use crate::{EngineError, GraphDiagnostic};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Timing knobs for a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionConfig {
    pub poller: PollerConfig,
    pub pulse: PulseConfig,
}

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// Result of a service call, tagged with the attempt that issued it.
#[derive(Debug)]
pub enum ServiceReply {
    Accepted {
        generation: Generation,
        result: Result<String, ClientError>,
    },
    Snapshot {
        generation: Generation,
        result: Result<ExecutionSnapshot, ClientError>,
    },
}

impl ServiceReply {
    pub fn generation(&self) -> Generation {
        match self {
            Self::Accepted { generation, .. } | Self::Snapshot { generation, .. } => *generation,
        }
    }
}

/// Work queued on the session's timer queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerTask {
    Poll { generation: Generation },
    PulseOn { connection_id: String },
    PulseOff { connection_id: String },
    Reset { generation: Generation },
}

/// Something the session did in response to a timer or reply.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    ExecutionStarted { generation: Generation, execution_id: String },
    PollIssued { generation: Generation },
    SnapshotApplied {
        generation: Generation,
        status: ExecutionStatus,
        executed: usize,
        total: usize,
    },
    Completed { generation: Generation },
    Failed { generation: Generation, reason: FailureReason },
    /// A reply or timer from a superseded attempt was dropped.
    Discarded { generation: Generation },
    PulseOn { connection_id: String },
    PulseOff { connection_id: String },
    /// Cool-down finished: poller idle, every node idle.
    Reset,
}

/// Outcome of [`CanvasSession::start`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started(Generation),
    /// The poller was not idle; nothing was scheduled.
    AlreadyRunning,
}

/// The one outstanding service call.
struct InFlight {
    /// Matches the tag on the reply this task sends.
    request: u64,
    generation: Generation,
    task: JoinHandle<()>,
}

/// What woke [`CanvasSession::next_event`] up.
enum Wake {
    Reply(Option<(u64, ServiceReply)>),
    TaskEnded(Result<(), JoinError>),
    Timer,
}

// ---------------------------------------------------------------------------
// CanvasSession
// ---------------------------------------------------------------------------

pub struct CanvasSession {
    graph: WorkflowGraph,
    diagnostics: Vec<GraphDiagnostic>,
    poller: Poller,
    timers: TimerQueue<TimerTask>,
    poll_timer: Option<TimerHandle>,
    in_flight: Option<InFlight>,
    next_request: u64,
    replies_tx: mpsc::UnboundedSender<(u64, ServiceReply)>,
    replies_rx: mpsc::UnboundedReceiver<(u64, ServiceReply)>,
    service: Arc<dyn ExecutionService>,
    config: SessionConfig,
}

impl CanvasSession {
    /// Open a session on `workflow` with the default layered layout.
    pub fn new(
        workflow: &WorkflowDefinition,
        service: Arc<dyn ExecutionService>,
        config: SessionConfig,
    ) -> Self {
        Self::with_layout(workflow, service, config, &LayeredLayout::default())
    }

    /// Open a session on `workflow`, placing unpositioned steps with `layout`.
    pub fn with_layout(
        workflow: &WorkflowDefinition,
        service: Arc<dyn ExecutionService>,
        config: SessionConfig,
        layout: &dyn LayoutStrategy,
    ) -> Self {
        let build = build_graph(workflow, layout);
        let (replies_tx, replies_rx) = mpsc::unbounded_channel();
        Self {
            graph: build.graph,
            diagnostics: build.diagnostics,
            poller: Poller::new(),
            timers: TimerQueue::new(),
            poll_timer: None,
            in_flight: None,
            next_request: 0,
            replies_tx,
            replies_rx,
            service,
            config,
        }
    }

    /// Fetch the workflow list and open a session on `workflow_id`.
    ///
    /// # Errors
    /// [`EngineError::Service`] if the list cannot be fetched,
    /// [`EngineError::WorkflowNotFound`] if no workflow has that id.
    pub async fn load(
        service: Arc<dyn ExecutionService>,
        workflow_id: &str,
        config: SessionConfig,
    ) -> Result<Self, EngineError> {
        let workflows = service.list_workflows().await?;
        let workflow = workflows
            .into_iter()
            .find(|w| w.id == workflow_id)
            .ok_or_else(|| EngineError::WorkflowNotFound(workflow_id.to_owned()))?;
        Ok(Self::new(&workflow, service, config))
    }

    /// Switch to another workflow, abandoning any execution in progress.
    pub fn select(&mut self, workflow: &WorkflowDefinition, layout: &dyn LayoutStrategy) {
        self.shutdown();
        let build = build_graph(workflow, layout);
        self.graph = build.graph;
        self.diagnostics = build.diagnostics;
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn graph(&self) -> &WorkflowGraph {
        &self.graph
    }

    /// Mutable access for the editing API in [`crate::mutation`].
    pub fn graph_mut(&mut self) -> &mut WorkflowGraph {
        &mut self.graph
    }

    /// Problems found when the current graph was built.
    pub fn diagnostics(&self) -> &[GraphDiagnostic] {
        &self.diagnostics
    }

    pub fn poller_state(&self) -> &PollerState {
        self.poller.state()
    }

    pub fn generation(&self) -> Generation {
        self.poller.generation()
    }

    pub fn timers(&self) -> &TimerQueue<TimerTask> {
        &self.timers
    }

    /// Number of scheduled status polls (never more than one).
    pub fn pending_polls(&self) -> usize {
        self.timers.count_where(|t| matches!(t, TimerTask::Poll { .. }))
    }

    /// `true` while a service call is outstanding.
    pub fn request_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    // -----------------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------------

    /// Start executing the workflow with `input` as its `input_data`.
    ///
    /// Must be called from within a tokio runtime.  A no-op returning
    /// [`StartOutcome::AlreadyRunning`] unless the poller is idle.
    #[instrument(skip(self, input), fields(workflow_id = %self.graph.workflow_id()))]
    pub fn start(&mut self, input: Value) -> StartOutcome {
        let Some(generation) = self.poller.start() else {
            info!("execution already in progress; start ignored");
            return StartOutcome::AlreadyRunning;
        };

        let service = Arc::clone(&self.service);
        let workflow_id = self.graph.workflow_id().to_owned();
        self.spawn_request(generation, async move {
            let result = service.execute(&workflow_id, &input).await;
            ServiceReply::Accepted { generation, result }
        });

        StartOutcome::Started(generation)
    }

    /// Cancel the execution in progress.
    ///
    /// Stops the scheduled poll, aborts the outstanding request, and starts
    /// the cool-down.  Returns `false` if nothing was running.
    #[instrument(skip(self), fields(workflow_id = %self.graph.workflow_id()))]
    pub fn cancel(&mut self) -> bool {
        let Some(generation) = self.poller.cancel() else {
            return false;
        };
        if let Some(handle) = self.poll_timer.take() {
            self.timers.cancel(handle);
        }
        if let Some(in_flight) = self.in_flight.take() {
            in_flight.task.abort();
        }
        self.schedule_reset(generation);
        true
    }

    /// Release every timer and outstanding request; the poller returns to
    /// idle under a fresh generation.  Returns the number of timers dropped.
    pub fn shutdown(&mut self) -> usize {
        if let Some(in_flight) = self.in_flight.take() {
            in_flight.task.abort();
        }
        self.poll_timer = None;
        self.poller.abandon();
        let dropped = self.timers.clear();
        if dropped > 0 {
            debug!("released {dropped} pending timers");
        }
        dropped
    }

    /// Tear the session down.
    pub fn close(mut self) {
        self.shutdown();
    }

    // -----------------------------------------------------------------------
    // Driving
    // -----------------------------------------------------------------------

    /// Wait for the next due timer or service reply and process it.
    ///
    /// Returns `None` once there is nothing left to wait for.  A service
    /// task that dies without replying fails its attempt.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        loop {
            let now = Instant::now();
            if let Some(task) = self.timers.pop_due(now) {
                return Some(self.fire(task));
            }
            if let Ok((request, reply)) = self.replies_rx.try_recv() {
                return Some(self.receive(request, reply));
            }

            let deadline = self.timers.next_deadline();
            if deadline.is_none() && self.in_flight.is_none() {
                return None;
            }
            let wake_at = deadline.unwrap_or_else(|| now + Duration::from_secs(3600));

            let replies = &mut self.replies_rx;
            let in_flight = &mut self.in_flight;
            let wake = tokio::select! {
                reply = replies.recv() => Wake::Reply(reply),
                joined = async move {
                    match in_flight {
                        Some(f) => (&mut f.task).await,
                        None => std::future::pending().await,
                    }
                } => Wake::TaskEnded(joined),
                _ = tokio::time::sleep_until(wake_at), if deadline.is_some() => Wake::Timer,
            };

            match wake {
                Wake::Reply(Some((request, reply))) => {
                    return Some(self.receive(request, reply));
                }
                Wake::Reply(None) | Wake::Timer => {}
                // The task has already queued its reply.
                Wake::TaskEnded(Ok(())) => self.in_flight = None,
                Wake::TaskEnded(Err(err)) => {
                    let Some(ended) = self.in_flight.take() else {
                        continue;
                    };
                    if err.is_cancelled() {
                        continue;
                    }
                    warn!("service call for attempt {} died: {err}", ended.generation);
                    let reason = FailureReason::Transport(format!("service call died: {err}"));
                    return Some(self.fail_attempt(ended.generation, reason));
                }
            }
        }
    }

    /// Process events until the poller is idle and nothing is pending.
    pub async fn run_until_idle(&mut self) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.next_event().await {
            events.push(event);
        }
        events
    }

    /// Apply one service reply.
    ///
    /// Replies whose generation is no longer live are discarded without
    /// touching the graph.  Does not affect the outstanding service call;
    /// its own reply is still delivered through [`Self::next_event`].
    pub fn apply_reply(&mut self, reply: ServiceReply) -> SessionEvent {
        let generation = reply.generation();

        match reply {
            ServiceReply::Accepted { result: Ok(execution_id), .. } => {
                if !self.poller.accept(generation, &execution_id) {
                    return self.discard(generation);
                }
                self.schedule_poll(generation, self.config.poller.initial_delay);
                SessionEvent::ExecutionStarted { generation, execution_id }
            }

            ServiceReply::Accepted { result: Err(err), .. }
            | ServiceReply::Snapshot { result: Err(err), .. } => {
                self.fail_attempt(generation, FailureReason::from(&err))
            }

            ServiceReply::Snapshot { result: Ok(snapshot), .. } => {
                let transition = self.poller.observe(generation, &snapshot);
                if transition == Transition::Stale {
                    return self.discard(generation);
                }

                let update = map_snapshot(&self.graph, &snapshot, &self.config.pulse);
                self.graph = update.graph;
                let now = Instant::now();
                for event in update.events {
                    let on_at = now + event.delay;
                    let on = TimerTask::PulseOn {
                        connection_id: event.connection_id.clone(),
                    };
                    let off = TimerTask::PulseOff {
                        connection_id: event.connection_id,
                    };
                    self.timers.schedule(on_at, on);
                    self.timers.schedule(on_at + event.duration, off);
                }

                match transition {
                    Transition::Continue => {
                        self.schedule_poll(generation, self.config.poller.poll_interval);
                        let (executed, total) = snapshot.progress(self.graph.nodes().len());
                        SessionEvent::SnapshotApplied {
                            generation,
                            status: snapshot.status,
                            executed,
                            total,
                        }
                    }
                    Transition::Completed => {
                        self.schedule_reset(generation);
                        SessionEvent::Completed { generation }
                    }
                    Transition::Failed(reason) => {
                        self.schedule_reset(generation);
                        SessionEvent::Failed { generation, reason }
                    }
                    Transition::Stale => self.discard(generation),
                }
            }
        }
    }

    fn fire(&mut self, task: TimerTask) -> SessionEvent {
        match task {
            TimerTask::Poll { generation } => {
                self.poll_timer = None;
                let execution_id = match self.poller.execution_id() {
                    Some(id) if self.poller.is_live(generation) => id.to_owned(),
                    _ => return self.discard(generation),
                };

                let service = Arc::clone(&self.service);
                self.spawn_request(generation, async move {
                    let result = service.execution_status(&execution_id).await;
                    ServiceReply::Snapshot { generation, result }
                });
                SessionEvent::PollIssued { generation }
            }

            TimerTask::PulseOn { connection_id } => {
                self.graph.set_animated(&connection_id, true);
                SessionEvent::PulseOn { connection_id }
            }

            TimerTask::PulseOff { connection_id } => {
                self.graph.set_animated(&connection_id, false);
                SessionEvent::PulseOff { connection_id }
            }

            TimerTask::Reset { generation } => {
                if !self.poller.finish_cooldown(generation) {
                    return self.discard(generation);
                }
                self.graph.reset_statuses();
                info!("cool-down finished; canvas reset to idle");
                SessionEvent::Reset
            }
        }
    }

    /// Run `call` on its own task, replacing any call still outstanding.
    fn spawn_request<F>(&mut self, generation: Generation, call: F)
    where
        F: Future<Output = ServiceReply> + Send + 'static,
    {
        if let Some(previous) = self.in_flight.take() {
            previous.task.abort();
        }
        let request = self.next_request;
        self.next_request += 1;

        let tx = self.replies_tx.clone();
        let task = tokio::spawn(async move {
            let reply = call.await;
            // Receiver gone means the session was dropped.
            let _ = tx.send((request, reply));
        });
        self.in_flight = Some(InFlight { request, generation, task });
    }

    /// A reply from a task spawned by [`Self::spawn_request`].
    fn receive(&mut self, request: u64, reply: ServiceReply) -> SessionEvent {
        if self.in_flight.as_ref().is_some_and(|f| f.request == request) {
            self.in_flight = None;
        }
        self.apply_reply(reply)
    }

    fn fail_attempt(&mut self, generation: Generation, reason: FailureReason) -> SessionEvent {
        if !self.poller.fail(generation, reason.clone()) {
            return self.discard(generation);
        }
        if let Some(handle) = self.poll_timer.take() {
            self.timers.cancel(handle);
        }
        self.schedule_reset(generation);
        SessionEvent::Failed { generation, reason }
    }

    fn schedule_poll(&mut self, generation: Generation, delay: Duration) {
        // One poll outstanding at most.
        if let Some(previous) = self.poll_timer.take() {
            self.timers.cancel(previous);
        }
        let handle = self
            .timers
            .schedule(Instant::now() + delay, TimerTask::Poll { generation });
        self.poll_timer = Some(handle);
    }

    fn schedule_reset(&mut self, generation: Generation) {
        self.timers.schedule(
            Instant::now() + self.config.poller.cooldown,
            TimerTask::Reset { generation },
        );
    }

    fn discard(&self, generation: Generation) -> SessionEvent {
        debug!("discarding stale work from attempt {generation}");
        SessionEvent::Discarded { generation }
    }
}

impl Drop for CanvasSession {
    fn drop(&mut self) {
        if self.in_flight.is_some() || !self.timers.is_empty() {
            warn!("canvas session dropped with pending work; releasing it");
        }
        self.shutdown();
    }
}
