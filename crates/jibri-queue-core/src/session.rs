//! Queue session state machine.
//!
//! One session per (queue, room) pair. Membership moves through:
//!
//! ```text
//! ┌───────────┐  Join   ┌───────────┐  JoinCompleted(Ok)  ┌────────┐
//! │ NotJoined │────────>│ NotJoined │────────────────────>│ Joined │
//! └───────────┘         │ (pending) │                     └────────┘
//!       ^               └───────────┘                         │ Leave
//!       │                     │ JoinCompleted(Err)            ↓
//!       │                     ↓                         ┌───────────┐
//!       │               ┌───────────┐                   │  Joined   │
//!       │               │ NotJoined │                   │ (pending) │
//!       │               └───────────┘                   └───────────┘
//!       │                                                     │ LeaveCompleted(Ok)
//!       └──────────── ResetMembership ────────────────────────┤
//!                                          KeepMembership ──> Joined
//! ```
//!
//! Pushes are only processed while `Joined`; anything delivered before the
//! join acknowledgment is applied is dropped without an acknowledgment.

use jibri_queue_proto::{
    Condition, Jid, Stanza,
    queue::{self, QueueUpdate},
};

use crate::{
    LeavePolicy, MetricsSnapshot, Operation, QueueAction, QueueConfig, QueueError, QueueEvent,
    QueueInput, TransportError,
};

/// Local view of queue membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Membership {
    /// No acknowledged join
    NotJoined,
    /// Join acknowledged by the queue service
    Joined,
}

/// Membership and metrics for one queue/room pair.
///
/// Pure state machine: no I/O, no clock. Requests are returned as
/// [`QueueAction::SendRequest`] and their outcome comes back as an input.
#[derive(Debug, Clone)]
pub struct QueueSession {
    /// Address of the queue service
    queue: Jid,
    /// Conference room the membership is for
    room: Jid,
    /// Configuration
    config: QueueConfig,
    /// Current membership
    membership: Membership,
    /// Request sent but not yet settled
    pending: Option<Operation>,
    /// Last known metrics
    metrics: MetricsSnapshot,
    /// Set once disposed; never cleared
    disposed: bool,
}

impl QueueSession {
    /// Create a session in [`Membership::NotJoined`].
    pub fn new(queue: Jid, room: Jid, config: QueueConfig) -> Self {
        Self {
            queue,
            room,
            config,
            membership: Membership::NotJoined,
            pending: None,
            metrics: MetricsSnapshot::default(),
            disposed: false,
        }
    }

    /// Address of the queue service.
    pub fn queue(&self) -> &Jid {
        &self.queue
    }

    /// Conference room address.
    pub fn room(&self) -> &Jid {
        &self.room
    }

    /// Current membership.
    pub fn membership(&self) -> Membership {
        self.membership
    }

    /// True if the join was acknowledged.
    pub fn is_joined(&self) -> bool {
        self.membership == Membership::Joined
    }

    /// Request currently in flight. `None` if idle.
    pub fn pending(&self) -> Option<Operation> {
        self.pending
    }

    /// Last known metrics.
    pub fn metrics(&self) -> &MetricsSnapshot {
        &self.metrics
    }

    /// True once [`QueueInput::Dispose`] was handled.
    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Process an input and return resulting actions.
    ///
    /// # Errors
    ///
    /// - `QueueError::AlreadyJoined` for `Join` while joined
    /// - `QueueError::NotJoined` for `Leave` while not joined
    /// - `QueueError::RequestPending` for a repeated in-flight request
    /// - `QueueError::Disposed` for `Join`/`Leave` after disposal
    /// - `QueueError::Transport` when a completion carries a failure
    pub fn handle(&mut self, input: QueueInput) -> Result<Vec<QueueAction>, QueueError> {
        match input {
            QueueInput::Join => self.handle_join(),
            QueueInput::Leave => self.handle_leave(),
            QueueInput::JoinCompleted(outcome) => self.handle_join_completed(outcome),
            QueueInput::LeaveCompleted(outcome) => self.handle_leave_completed(outcome),
            QueueInput::StanzaReceived(stanza) => Ok(self.handle_stanza(&stanza)),
            QueueInput::Dispose => Ok(self.handle_dispose()),
        }
    }

    fn handle_join(&mut self) -> Result<Vec<QueueAction>, QueueError> {
        if self.disposed {
            return Err(QueueError::Disposed);
        }

        if self.membership == Membership::Joined {
            return Err(QueueError::AlreadyJoined);
        }

        if self.pending == Some(Operation::Join) {
            return Err(QueueError::RequestPending { operation: Operation::Join });
        }

        self.pending = Some(Operation::Join);

        Ok(vec![
            QueueAction::SendRequest {
                operation: Operation::Join,
                stanza: queue::join_request(&self.queue, &self.room),
            },
            QueueAction::Log {
                message: format!("Joining queue {} for room {}", self.queue, self.room),
            },
        ])
    }

    fn handle_leave(&mut self) -> Result<Vec<QueueAction>, QueueError> {
        if self.disposed {
            return Err(QueueError::Disposed);
        }

        if self.membership == Membership::NotJoined {
            return Err(QueueError::NotJoined);
        }

        if self.pending == Some(Operation::Leave) {
            return Err(QueueError::RequestPending { operation: Operation::Leave });
        }

        self.pending = Some(Operation::Leave);

        Ok(vec![
            QueueAction::SendRequest {
                operation: Operation::Leave,
                stanza: queue::leave_request(&self.queue),
            },
            QueueAction::Log { message: format!("Leaving queue {}", self.queue) },
        ])
    }

    fn handle_join_completed(
        &mut self,
        outcome: Result<(), TransportError>,
    ) -> Result<Vec<QueueAction>, QueueError> {
        if self.pending == Some(Operation::Join) {
            self.pending = None;
        }

        outcome?;

        if self.disposed {
            return Err(QueueError::Disposed);
        }

        self.membership = Membership::Joined;

        Ok(vec![QueueAction::Log {
            message: format!("Joined queue {} for room {}", self.queue, self.room),
        }])
    }

    fn handle_leave_completed(
        &mut self,
        outcome: Result<(), TransportError>,
    ) -> Result<Vec<QueueAction>, QueueError> {
        if self.pending == Some(Operation::Leave) {
            self.pending = None;
        }

        outcome?;

        match self.config.leave_policy {
            LeavePolicy::KeepMembership => Ok(vec![QueueAction::Log {
                message: format!("Left queue {} (membership kept)", self.queue),
            }]),
            LeavePolicy::ResetMembership => {
                self.membership = Membership::NotJoined;
                self.metrics = MetricsSnapshot::default();

                Ok(vec![QueueAction::Log { message: format!("Left queue {}", self.queue) }])
            },
        }
    }

    /// Classify an inbound push.
    ///
    /// Returns no `SendAck` for the silent paths (not joined, disposed, foreign
    /// sender, missing payload). Every other push gets exactly one.
    fn handle_stanza(&mut self, stanza: &Stanza) -> Vec<QueueAction> {
        if self.disposed || self.membership == Membership::NotJoined {
            return vec![QueueAction::Log {
                message: format!("Dropping push {:?}: not joined", stanza.id()),
            }];
        }

        if stanza.from() != Some(&self.queue) {
            return vec![QueueAction::Log {
                message: format!(
                    "Dropping push {:?}: sender {:?} is not {}",
                    stanza.id(),
                    stanza.from().map(Jid::as_str),
                    self.queue
                ),
            }];
        }

        let Some(payload) = queue::payload(stanza) else {
            return vec![QueueAction::Log {
                message: format!("Dropping push {:?}: no jibri-queue payload", stanza.id()),
            }];
        };

        let mut actions = Vec::new();

        let ack = match QueueUpdate::parse(payload) {
            QueueUpdate::Info(fields) => {
                if self.metrics.apply_all(&fields) {
                    actions.push(QueueAction::Emit(QueueEvent::Metrics(self.metrics.clone())));
                }
                queue::ack(stanza)
            },
            QueueUpdate::Token(value) => {
                actions.push(QueueAction::Emit(QueueEvent::Token(value)));
                queue::ack(stanza)
            },
            QueueUpdate::Unknown(action) => {
                actions.push(QueueAction::Log {
                    message: format!("Unsupported queue action {action:?}, answering with error"),
                });
                queue::error_ack(stanza, &Condition::ServiceUnavailable)
            },
        };

        actions.push(QueueAction::SendAck(ack));
        actions
    }

    fn handle_dispose(&mut self) -> Vec<QueueAction> {
        if self.disposed {
            return vec![];
        }

        self.disposed = true;
        self.membership = Membership::NotJoined;
        self.metrics = MetricsSnapshot::default();

        vec![QueueAction::Unregister, QueueAction::Log {
            message: format!("Disposed queue session for {}", self.queue),
        }]
    }
}
