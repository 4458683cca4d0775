//! In-memory stanza transport.
//!
//! `SimConnection` implements [`Connection`] without a network. Requests are
//! answered by a responder (a fixed [`Reply`] or a closure), inbound stanzas
//! are injected with [`SimConnection::deliver`], and everything the client
//! sends is recorded for assertions.
//!
//! Handlers are invoked with no internal lock held, so a handler may send
//! (acknowledge) through the same connection while it is being delivered to.

use std::{
    collections::BTreeMap,
    fmt,
    future::Future,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use jibri_queue_client::{Connection, Disposition, HandlerRef, StanzaHandler};
use jibri_queue_core::TransportError;
use jibri_queue_proto::{Condition, HandlerFilter, Jid, Stanza, StanzaType, queue};
use tokio::sync::oneshot;

/// How the simulated remote answers a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Result stanza
    Accept,
    /// Error stanza carrying the condition
    Error(Condition),
    /// Request never reached the remote
    Fail(String),
    /// No answer until [`SimConnection::release`] is called
    Hold,
}

type Responder = Arc<dyn Fn(&Stanza) -> Reply + Send + Sync>;
type Settle = oneshot::Sender<Result<Stanza, TransportError>>;

struct Registration {
    handle: HandlerRef,
    filter: HandlerFilter,
    handler: Arc<dyn StanzaHandler>,
}

struct State {
    connected: bool,
    next_handler: u64,
    next_request: u64,
    handlers: Vec<Registration>,
    responder: Responder,
    held: BTreeMap<String, (Stanza, Settle)>,
    requests: Vec<Stanza>,
    sent: Vec<Stanza>,
}

/// In-memory [`Connection`] for tests and the simulation CLI.
pub struct SimConnection {
    local: Jid,
    state: Mutex<State>,
}

impl fmt::Debug for SimConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state();
        f.debug_struct("SimConnection")
            .field("local", &self.local)
            .field("connected", &state.connected)
            .field("handlers", &state.handlers.len())
            .field("held", &state.held.len())
            .finish_non_exhaustive()
    }
}

impl SimConnection {
    /// Connection for the local address `local` that accepts every request.
    pub fn new(local: Jid) -> Self {
        Self {
            local,
            state: Mutex::new(State {
                connected: true,
                next_handler: 0,
                next_request: 0,
                handlers: Vec::new(),
                responder: Arc::new(|_| Reply::Accept),
                held: BTreeMap::new(),
                requests: Vec::new(),
                sent: Vec::new(),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Local address stamped on outgoing requests.
    pub fn local(&self) -> &Jid {
        &self.local
    }

    /// Answer every following request with `reply`.
    pub fn set_reply(&self, reply: Reply) {
        self.state().responder = Arc::new(move |_| reply.clone());
    }

    /// Decide each following request with `responder`.
    pub fn set_responder<F>(&self, responder: F)
    where
        F: Fn(&Stanza) -> Reply + Send + Sync + 'static,
    {
        self.state().responder = Arc::new(responder);
    }

    /// Inject an inbound stanza.
    ///
    /// Handlers whose filter matches are tried in registration order until one
    /// returns [`Disposition::Handled`]. Returns the last disposition, or
    /// `None` if no handler matched.
    pub fn deliver(&self, stanza: &Stanza) -> Option<Disposition> {
        let handlers: Vec<Arc<dyn StanzaHandler>> = {
            let state = self.state();
            if !state.connected {
                return None;
            }
            state
                .handlers
                .iter()
                .filter(|r| r.filter.matches(stanza))
                .map(|r| Arc::clone(&r.handler))
                .collect()
        };

        let mut disposition = None;
        for handler in handlers {
            let outcome = handler.handle(stanza);
            disposition = Some(outcome);
            if outcome == Disposition::Handled {
                break;
            }
        }

        tracing::trace!(id = ?stanza.id(), ?disposition, "delivered stanza");
        disposition
    }

    /// Settle a held request with `reply`. Returns false if `id` is not held.
    pub fn release_with(&self, id: &str, reply: Reply) -> bool {
        let Some((request, settle)) = self.state().held.remove(id) else {
            return false;
        };

        let outcome = answer(&request, &reply);
        let _ = settle.send(outcome);
        true
    }

    /// Accept a held request. Returns false if `id` is not held.
    pub fn release(&self, id: &str) -> bool {
        self.release_with(id, Reply::Accept)
    }

    /// Correlation ids of requests waiting for [`SimConnection::release`].
    pub fn held(&self) -> Vec<String> {
        self.state().held.keys().cloned().collect()
    }

    /// Drop the connection: held requests fail with
    /// [`TransportError::Disconnected`], further sends fail, deliveries reach
    /// nobody.
    pub fn disconnect(&self) {
        let held = {
            let mut state = self.state();
            state.connected = false;
            std::mem::take(&mut state.held)
        };
        tracing::debug!(local = %self.local, held = held.len(), "simulated disconnect");
        drop(held);
    }

    /// Every request sent so far, with correlation ids assigned.
    pub fn requests(&self) -> Vec<Stanza> {
        self.state().requests.clone()
    }

    /// Every fire-and-forget stanza sent so far.
    pub fn sent(&self) -> Vec<Stanza> {
        self.state().sent.clone()
    }

    /// Drain the fire-and-forget log.
    pub fn take_sent(&self) -> Vec<Stanza> {
        std::mem::take(&mut self.state().sent)
    }

    /// Number of live handler registrations.
    pub fn handler_count(&self) -> usize {
        self.state().handlers.len()
    }
}

/// What the remote answers to `request`, as the requester sees it.
fn answer(request: &Stanza, reply: &Reply) -> Result<Stanza, TransportError> {
    let stanza = match reply {
        Reply::Accept => queue::ack(request),
        Reply::Error(condition) => queue::error_ack(request, condition),
        Reply::Fail(reason) => return Err(TransportError::Delivery(reason.clone())),
        Reply::Hold => return Err(TransportError::Delivery("request still held".into())),
    };
    settle(stanza)
}

/// Turn an answer stanza into the request outcome.
fn settle(stanza: Stanza) -> Result<Stanza, TransportError> {
    if stanza.stanza_type() != StanzaType::Error {
        return Ok(stanza);
    }

    match stanza.error_condition() {
        Ok(condition) => Err(TransportError::Remote {
            condition,
            text: stanza.error_text().map(str::to_owned),
        }),
        Err(e) => Err(TransportError::Delivery(e.to_string())),
    }
}

impl Connection for SimConnection {
    fn add_handler(&self, filter: HandlerFilter, handler: Arc<dyn StanzaHandler>) -> HandlerRef {
        let mut state = self.state();
        let handle = HandlerRef::new(state.next_handler);
        state.next_handler += 1;
        state.handlers.push(Registration { handle, filter, handler });
        tracing::trace!(%handle, "handler registered");
        handle
    }

    fn delete_handler(&self, handle: HandlerRef) -> Result<(), TransportError> {
        let mut state = self.state();
        let before = state.handlers.len();
        state.handlers.retain(|r| r.handle != handle);

        if state.handlers.len() == before {
            return Err(TransportError::UnknownHandler(handle.id()));
        }

        tracing::trace!(%handle, "handler removed");
        Ok(())
    }

    fn send_request(
        &self,
        mut stanza: Stanza,
    ) -> impl Future<Output = Result<Stanza, TransportError>> + Send {
        let (tx, rx) = oneshot::channel();

        let responder = {
            let mut state = self.state();
            if stanza.id().is_none() {
                let id = format!("sim-{}", state.next_request);
                stanza.set_id(id);
            }
            state.next_request += 1;
            if stanza.from().is_none() {
                stanza = stanza.with_from(self.local.clone());
            }
            state.requests.push(stanza.clone());
            state.connected.then(|| Arc::clone(&state.responder))
        };

        match responder {
            None => {
                let _ = tx.send(Err(TransportError::Disconnected));
            },
            Some(responder) => match responder(&stanza) {
                Reply::Hold => {
                    let id = stanza.id().unwrap_or_default().to_owned();
                    tracing::debug!(%id, "holding request");
                    self.state().held.insert(id, (stanza, tx));
                },
                reply => {
                    let _ = tx.send(answer(&stanza, &reply));
                },
            },
        }

        async move { rx.await.unwrap_or(Err(TransportError::Disconnected)) }
    }

    fn send(&self, stanza: Stanza) -> Result<(), TransportError> {
        let mut state = self.state();
        if !state.connected {
            return Err(TransportError::Disconnected);
        }
        state.sent.push(stanza);
        Ok(())
    }
}
