//! Execution poller state machine.
//!
//! ```text
//! Idle ─start─▶ Requesting ─accepted─▶ Polling ─completed─▶ Completed ─┐
//!                   │                    │  ╰──failed───▶ Failed ──────┤ cool-down
//!                   ╰──error──▶ Failed   ╰──cancel──▶ Cancelled ───────┴──▶ Idle
//! ```
//!
//! The machine is pure: it performs no I/O and owns no timers.  Every
//! attempt gets a fresh [`Generation`]; replies carry the generation they
//! were issued under and are ignored unless it is still the live one.

use std::time::Duration;

use client::{ClientError, ExecutionSnapshot, ExecutionStatus};
use tracing::{debug, info, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Poll timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollerConfig {
    /// Delay between an accepted execute call and the first status poll.
    pub initial_delay: Duration,
    /// Delay between a `running` snapshot and the next poll.
    pub poll_interval: Duration,
    /// Time spent in a terminal state before returning to idle.
    pub cooldown: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(500),
            poll_interval: Duration::from_millis(1000),
            cooldown: Duration::from_millis(3000),
        }
    }
}

// ---------------------------------------------------------------------------
// States
// ---------------------------------------------------------------------------

/// Monotonic execution-attempt token.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(u64);

impl Generation {
    fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl std::fmt::Display for Generation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Why an execution ended in [`PollerState::Failed`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// The service rejected the credential; never retried.
    AuthRequired,
    /// A start or poll request failed.
    Transport(String),
    /// The service reported the execution itself as failed.
    ExecutionFailed(Option<String>),
}

impl From<&ClientError> for FailureReason {
    fn from(err: &ClientError) -> Self {
        match err {
            ClientError::AuthRequired => Self::AuthRequired,
            other => Self::Transport(other.to_string()),
        }
    }
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AuthRequired => write!(f, "authentication required"),
            Self::Transport(msg) => write!(f, "request failed: {msg}"),
            Self::ExecutionFailed(Some(msg)) => write!(f, "execution failed: {msg}"),
            Self::ExecutionFailed(None) => write!(f, "execution failed"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PollerState {
    #[default]
    Idle,
    /// Waiting for the execute call to be accepted.
    Requesting,
    /// Polling the status of `execution_id`.
    Polling { execution_id: String },
    Completed,
    Failed(FailureReason),
    Cancelled,
}

impl PollerState {
    /// `true` while an attempt is in progress.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Requesting | Self::Polling { .. })
    }

    /// `true` in the states that cool down back to idle.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed(_) | Self::Cancelled)
    }
}

/// What a status reply did to the machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Reply belongs to a superseded attempt; nothing changed.
    Stale,
    /// Still running; poll again.
    Continue,
    Completed,
    Failed(FailureReason),
}

// ---------------------------------------------------------------------------
// Poller
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct Poller {
    state: PollerState,
    generation: Generation,
}

impl Poller {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &PollerState {
        &self.state
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Execution being polled, if any.
    pub fn execution_id(&self) -> Option<&str> {
        match &self.state {
            PollerState::Polling { execution_id } => Some(execution_id),
            _ => None,
        }
    }

    /// `true` if replies tagged `generation` may still be applied.
    pub fn is_live(&self, generation: Generation) -> bool {
        generation == self.generation && self.state.is_active()
    }

    /// Begin a new attempt.  Only legal from `Idle`; returns `None` otherwise.
    pub fn start(&mut self) -> Option<Generation> {
        if self.state != PollerState::Idle {
            debug!("start rejected in state {:?}", self.state);
            return None;
        }
        self.generation = self.generation.next();
        self.state = PollerState::Requesting;
        info!("execution attempt {} requested", self.generation);
        Some(self.generation)
    }

    /// The execute call for `generation` was accepted.
    pub fn accept(&mut self, generation: Generation, execution_id: &str) -> bool {
        if !self.is_live(generation) || self.state != PollerState::Requesting {
            return false;
        }
        info!("execution '{execution_id}' accepted ({generation})");
        self.state = PollerState::Polling {
            execution_id: execution_id.to_owned(),
        };
        true
    }

    /// Feed a status snapshot received for `generation`.
    pub fn observe(&mut self, generation: Generation, snapshot: &ExecutionSnapshot) -> Transition {
        if !self.is_live(generation) || !matches!(self.state, PollerState::Polling { .. }) {
            return Transition::Stale;
        }
        match snapshot.status {
            ExecutionStatus::Running => Transition::Continue,
            ExecutionStatus::Completed => {
                info!("execution '{}' completed", snapshot.execution_id);
                self.state = PollerState::Completed;
                Transition::Completed
            }
            ExecutionStatus::Failed => {
                let reason = FailureReason::ExecutionFailed(snapshot.error_message.clone());
                warn!("execution '{}' failed: {reason}", snapshot.execution_id);
                self.state = PollerState::Failed(reason.clone());
                Transition::Failed(reason)
            }
        }
    }

    /// A request for `generation` failed.
    pub fn fail(&mut self, generation: Generation, reason: FailureReason) -> bool {
        if !self.is_live(generation) {
            return false;
        }
        warn!("execution attempt {generation} failed: {reason}");
        self.state = PollerState::Failed(reason);
        true
    }

    /// Abort the active attempt.  Legal from `Requesting` or `Polling`.
    ///
    /// Returns the generation the cool-down belongs to; replies from the
    /// aborted attempt no longer match it.
    pub fn cancel(&mut self) -> Option<Generation> {
        if !self.state.is_active() {
            return None;
        }
        self.generation = self.generation.next();
        self.state = PollerState::Cancelled;
        info!("execution attempt cancelled");
        Some(self.generation)
    }

    /// End the cool-down of `generation`'s terminal state.
    pub fn finish_cooldown(&mut self, generation: Generation) -> bool {
        if generation != self.generation || !self.state.is_terminal() {
            return false;
        }
        self.state = PollerState::Idle;
        true
    }

    /// Drop whatever is happening and return to `Idle` under a new generation.
    pub fn abandon(&mut self) {
        self.generation = self.generation.next();
        self.state = PollerState::Idle;
    }
}
