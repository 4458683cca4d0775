//! End-to-end simulated queue session.
//!
//! Wires a [`QueueClient`] to a [`SimQueueService`] through a
//! [`SimConnection`], joins, advances the queue until the client is served,
//! then leaves and disposes. Used by the CLI and by integration tests.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use jibri_queue_client::{ClientId, ClientIdAllocator, QueueClient};
use jibri_queue_core::{
    LeavePolicy, MetricsSnapshot, QueueConfig, QueueError, QueueEvent, QueueEventKind,
};
use jibri_queue_proto::{Condition, Jid, StanzaType};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::{Reply, SimConnection, SimQueueService};

/// Errors that end a scenario early.
#[derive(Error, Debug)]
pub enum ScenarioError {
    /// Client operation failed
    #[error("queue operation failed: {0}")]
    Queue(#[from] QueueError),

    /// Queue advanced `rounds` times without serving the client
    #[error("no token after {rounds} rounds")]
    Stalled {
        /// Rounds run
        rounds: usize,
    },
}

/// Scenario parameters.
#[derive(Debug, Clone)]
pub struct ScenarioConfig {
    /// Queue service address
    pub queue: Jid,
    /// Room the client queues for
    pub room: Jid,
    /// Client's own address
    pub local: Jid,
    /// Anonymous members already waiting when the client joins
    pub ahead: usize,
    /// Seed for wait estimates and tokens
    pub seed: u64,
    /// Client leave behavior
    pub leave_policy: LeavePolicy,
    /// Upper bound on queue advances
    pub max_rounds: usize,
}

/// What the client observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioReport {
    /// Client instance id
    pub client: ClientId,
    /// Every metrics event, in order
    pub metrics: Vec<MetricsSnapshot>,
    /// Token the client was served with
    pub token: String,
    /// Queue advances until the token arrived
    pub rounds: usize,
    /// Result acknowledgments the client sent
    pub acks: usize,
    /// Membership after leave
    pub joined_after_leave: bool,
}

fn lock(service: &Mutex<SimQueueService>) -> MutexGuard<'_, SimQueueService> {
    service.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Run one client through the queue.
///
/// # Errors
///
/// - `ScenarioError::Queue` if join, leave, or dispose fails
/// - `ScenarioError::Stalled` if no token arrives within `max_rounds`
pub async fn run(
    config: ScenarioConfig,
    ids: &ClientIdAllocator,
) -> Result<ScenarioReport, ScenarioError> {
    let service = Arc::new(Mutex::new(SimQueueService::new(config.queue.clone(), config.seed)));
    lock(&service).add_waiting(config.ahead);

    let connection = Arc::new(SimConnection::new(config.local.clone()));
    {
        let service = Arc::clone(&service);
        connection.set_responder(move |request| {
            let mut service = lock(&service);
            if !service.accepts(request) {
                return Reply::Error(Condition::ServiceUnavailable);
            }
            match service.handle_request(request) {
                Ok(()) => Reply::Accept,
                Err(condition) => Reply::Error(condition),
            }
        });
    }

    let client = QueueClient::with_config(
        Arc::clone(&connection),
        config.queue.clone(),
        config.room.clone(),
        QueueConfig::with_leave_policy(config.leave_policy),
        ids,
    );

    let (tx, mut rx) = mpsc::unbounded_channel();
    for kind in [QueueEventKind::Metrics, QueueEventKind::Token] {
        let tx = tx.clone();
        client.subscribe(kind, move |event| {
            let _ = tx.send(event.clone());
        });
    }

    client.join().await?;
    tracing::info!(client = %client.id(), queue = %config.queue, ahead = config.ahead, "joined");

    let mut metrics = Vec::new();
    let mut token = None;
    let mut rounds = 0;

    while token.is_none() && rounds < config.max_rounds {
        rounds += 1;
        let pushes = lock(&service).advance();

        for push in &pushes {
            connection.deliver(push);
        }

        while let Ok(event) = rx.try_recv() {
            match event {
                QueueEvent::Metrics(snapshot) => {
                    tracing::info!(
                        round = rounds,
                        position = ?snapshot.position,
                        eta = ?snapshot.estimated_time_left,
                        "queue update"
                    );
                    metrics.push(snapshot);
                },
                QueueEvent::Token(value) => {
                    tracing::info!(round = rounds, "token received");
                    token = Some(value);
                },
            }
        }
    }

    let Some(token) = token else {
        client.dispose()?;
        return Err(ScenarioError::Stalled { rounds });
    };

    client.leave().await?;
    let joined_after_leave = client.is_joined();
    client.dispose()?;

    let acks = connection.sent().iter().filter(|s| s.stanza_type() == StanzaType::Result).count();

    Ok(ScenarioReport { client: client.id(), metrics, token, rounds, acks, joined_after_leave })
}
