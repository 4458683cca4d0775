//! Async queue client.
//!
//! [`QueueClient`] owns a [`QueueSession`] behind a mutex and drives it over a
//! [`Connection`]. Every session action is executed here: requests are awaited,
//! acknowledgments are sent, events go to the [`EventBus`], log actions go to
//! `tracing`.
//!
//! The session lock is only held while the session computes its actions, never
//! while an action runs and never across an `.await`. Listeners may therefore
//! call back into the client (read metrics, even call `dispose`) from inside an
//! event callback.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use jibri_queue_core::{
    Jid, MetricsSnapshot, QueueAction, QueueConfig, QueueError, QueueEvent, QueueEventKind,
    QueueInput, QueueSession, Stanza, TransportError,
};
use jibri_queue_proto::{HandlerFilter, queue::NS_JIBRI_QUEUE};

use crate::{
    ClientId, ClientIdAllocator, Connection, Disposition, EventBus, HandlerRef, StanzaHandler,
    SubscriptionId,
};

/// What executing one batch of actions did.
#[derive(Default)]
struct Outcome {
    acked: bool,
    request: Option<Stanza>,
    unregister: bool,
}

/// State shared between the client handle and its registered stanza handler.
struct Inner<C> {
    id: ClientId,
    session: Mutex<QueueSession>,
    bus: EventBus,
    connection: Arc<C>,
}

impl<C: Connection> Inner<C> {
    fn session(&self) -> MutexGuard<'_, QueueSession> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn apply(&self, input: QueueInput) -> Result<Outcome, QueueError> {
        let actions = self.session().handle(input)?;
        Ok(self.execute(actions))
    }

    fn execute(&self, actions: Vec<QueueAction>) -> Outcome {
        let mut outcome = Outcome::default();

        for action in actions {
            match action {
                QueueAction::SendRequest { operation, stanza } => {
                    tracing::debug!(client = %self.id, %operation, "sending request");
                    outcome.request = Some(stanza);
                },
                QueueAction::SendAck(stanza) => {
                    outcome.acked = true;
                    let id = stanza.id().map(str::to_owned);
                    if let Err(e) = self.connection.send(stanza) {
                        tracing::warn!(client = %self.id, ?id, error = %e, "failed to send ack");
                    }
                },
                QueueAction::Emit(event) => {
                    self.publish(&event);
                },
                QueueAction::Unregister => {
                    outcome.unregister = true;
                },
                QueueAction::Log { message } => {
                    tracing::debug!(client = %self.id, "{message}");
                },
            }
        }

        outcome
    }

    fn publish(&self, event: &QueueEvent) {
        let delivered = self.bus.publish(event);
        tracing::trace!(client = %self.id, kind = ?event.kind(), delivered, "published event");
    }
}

impl<C: Connection> StanzaHandler for Inner<C> {
    fn handle(&self, stanza: &Stanza) -> Disposition {
        match self.apply(QueueInput::StanzaReceived(stanza.clone())) {
            Ok(outcome) if outcome.acked => Disposition::Handled,
            Ok(_) => Disposition::Ignored,
            Err(e) => {
                tracing::warn!(client = %self.id, error = %e, "inbound stanza rejected");
                Disposition::Ignored
            },
        }
    }
}

/// Member of one remote jibri queue on behalf of one room.
///
/// Construction registers an inbound handler for `jibri-queue` requests from
/// the queue's bare address. [`QueueClient::dispose`] (or dropping the client)
/// removes it.
///
/// # Example
///
/// ```ignore
/// let client = QueueClient::new(connection, queue, room, ClientIdAllocator::process());
/// client.subscribe(QueueEventKind::Token, |event| println!("{event:?}"));
/// client.join().await?;
/// ```
pub struct QueueClient<C: Connection> {
    inner: Arc<Inner<C>>,
    registration: Mutex<Option<HandlerRef>>,
}

impl<C: Connection> QueueClient<C> {
    /// Create a client with the default [`QueueConfig`].
    pub fn new(connection: Arc<C>, queue: Jid, room: Jid, ids: &ClientIdAllocator) -> Self {
        Self::with_config(connection, queue, room, QueueConfig::default(), ids)
    }

    /// Create a client and register its inbound handler.
    pub fn with_config(
        connection: Arc<C>,
        queue: Jid,
        room: Jid,
        config: QueueConfig,
        ids: &ClientIdAllocator,
    ) -> Self {
        let id = ids.next();
        let filter = HandlerFilter::requests_from(NS_JIBRI_QUEUE, queue.clone());

        tracing::info!(
            client = %id,
            %queue,
            %room,
            leave_policy = ?config.leave_policy,
            "creating queue client"
        );

        let inner = Arc::new(Inner {
            id,
            session: Mutex::new(QueueSession::new(queue, room, config)),
            bus: EventBus::new(),
            connection,
        });

        let handler = Arc::clone(&inner) as Arc<dyn StanzaHandler>;
        let registration = inner.connection.add_handler(filter, handler);

        Self { inner, registration: Mutex::new(Some(registration)) }
    }

    /// Instance sequence number.
    pub fn id(&self) -> ClientId {
        self.inner.id
    }

    /// Queue service address.
    pub fn queue(&self) -> Jid {
        self.inner.session().queue().clone()
    }

    /// Room this client queues for.
    pub fn room(&self) -> Jid {
        self.inner.session().room().clone()
    }

    /// True between a successful join acknowledgment and either
    /// [`QueueClient::dispose`] or a membership reset on leave.
    pub fn is_joined(&self) -> bool {
        self.inner.session().is_joined()
    }

    /// True once [`QueueClient::dispose`] ran.
    pub fn is_disposed(&self) -> bool {
        self.inner.session().is_disposed()
    }

    /// Last known position and wait estimate.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.inner.session().metrics().clone()
    }

    /// Listen for events of `kind`. Listeners run synchronously inside the
    /// inbound handler, in subscription order.
    pub fn subscribe<F>(&self, kind: QueueEventKind, listener: F) -> SubscriptionId
    where
        F: Fn(&QueueEvent) + Send + Sync + 'static,
    {
        self.inner.bus.subscribe(kind, listener)
    }

    /// Remove a listener. Returns false if it was not subscribed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.bus.unsubscribe(id)
    }

    /// Enter the queue.
    ///
    /// Resolves once the service acknowledged the join. Pushes that arrive
    /// before that are dropped without acknowledgment.
    ///
    /// # Errors
    ///
    /// - `QueueError::AlreadyJoined` if already joined (nothing is sent)
    /// - `QueueError::RequestPending` if a join is already in flight
    /// - `QueueError::Disposed` after [`QueueClient::dispose`], including a
    ///   dispose that happened while the request was in flight
    /// - `QueueError::Transport` if the request failed or was refused
    pub async fn join(&self) -> Result<(), QueueError> {
        let outcome = self.inner.apply(QueueInput::Join)?;
        let result = self.request(outcome.request).await;

        if let Err(e) = &result {
            tracing::warn!(client = %self.inner.id, error = %e, "join failed");
        }

        self.inner.apply(QueueInput::JoinCompleted(result))?;
        Ok(())
    }

    /// Leave the queue.
    ///
    /// # Errors
    ///
    /// - `QueueError::NotJoined` if not joined (nothing is sent)
    /// - `QueueError::RequestPending` if a leave is already in flight
    /// - `QueueError::Disposed` after [`QueueClient::dispose`]
    /// - `QueueError::Transport` if the request failed or was refused
    pub async fn leave(&self) -> Result<(), QueueError> {
        let outcome = self.inner.apply(QueueInput::Leave)?;
        let result = self.request(outcome.request).await;

        if let Err(e) = &result {
            tracing::warn!(client = %self.inner.id, error = %e, "leave failed");
        }

        self.inner.apply(QueueInput::LeaveCompleted(result))?;
        Ok(())
    }

    async fn request(&self, stanza: Option<Stanza>) -> Result<(), TransportError> {
        match stanza {
            Some(stanza) => self.inner.connection.send_request(stanza).await.map(drop),
            None => Ok(()),
        }
    }

    /// Unregister the inbound handler and detach every listener.
    ///
    /// In-flight `join`/`leave` calls are not cancelled. Calling it again is a
    /// no-op.
    ///
    /// # Errors
    ///
    /// - `QueueError::Transport` if the connection did not know the handler
    pub fn dispose(&self) -> Result<(), QueueError> {
        let outcome = self.inner.apply(QueueInput::Dispose)?;

        if outcome.unregister {
            self.inner.bus.clear();
            self.unregister()?;
            tracing::info!(client = %self.inner.id, "queue client disposed");
        }

        Ok(())
    }

    fn unregister(&self) -> Result<(), TransportError> {
        let registration = self.registration.lock().unwrap_or_else(PoisonError::into_inner).take();

        match registration {
            Some(handle) => self.inner.connection.delete_handler(handle),
            None => Ok(()),
        }
    }
}

impl<C: Connection> Drop for QueueClient<C> {
    fn drop(&mut self) {
        if let Err(e) = self.unregister() {
            tracing::warn!(client = %self.inner.id, error = %e, "failed to unregister on drop");
        }
    }
}

impl<C: Connection> std::fmt::Debug for QueueClient<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueClient")
            .field("id", &self.inner.id)
            .field("session", &*self.inner.session())
            .field("listeners", &self.inner.bus.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::{
        future::{Future, ready},
        sync::atomic::{AtomicU64, AtomicUsize, Ordering},
    };

    use jibri_queue_proto::{
        Condition, StanzaType,
        queue::{self, InfoField},
    };

    use super::*;

    const QUEUE: &str = "jibriqueue@svc.example";
    const ROOM: &str = "room@conference.example";
    const ME: &str = "me@example/web";

    fn jid(s: &str) -> Jid {
        s.parse().unwrap()
    }

    type Registered = (HandlerRef, HandlerFilter, Arc<dyn StanzaHandler>);

    /// Connection that answers every request immediately with a canned outcome.
    #[derive(Default)]
    struct MockConnection {
        next_handler: AtomicU64,
        handlers: Mutex<Vec<Registered>>,
        requests: Mutex<Vec<Stanza>>,
        sent: Mutex<Vec<Stanza>>,
        refuse_with: Mutex<Option<TransportError>>,
    }

    impl MockConnection {
        fn deliver(&self, stanza: &Stanza) -> Option<Disposition> {
            let handlers: Vec<_> = self
                .handlers
                .lock()
                .unwrap()
                .iter()
                .filter(|(_, filter, _)| filter.matches(stanza))
                .map(|(_, _, handler)| Arc::clone(handler))
                .collect();
            handlers.first().map(|handler| handler.handle(stanza))
        }

        fn sent(&self) -> Vec<Stanza> {
            self.sent.lock().unwrap().clone()
        }

        fn request_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    impl Connection for MockConnection {
        fn add_handler(
            &self,
            filter: HandlerFilter,
            handler: Arc<dyn StanzaHandler>,
        ) -> HandlerRef {
            let handle = HandlerRef::new(self.next_handler.fetch_add(1, Ordering::SeqCst));
            self.handlers.lock().unwrap().push((handle, filter, handler));
            handle
        }

        fn delete_handler(&self, handle: HandlerRef) -> Result<(), TransportError> {
            let mut handlers = self.handlers.lock().unwrap();
            let before = handlers.len();
            handlers.retain(|(h, _, _)| *h != handle);
            if handlers.len() == before {
                return Err(TransportError::UnknownHandler(handle.id()));
            }
            Ok(())
        }

        fn send_request(
            &self,
            stanza: Stanza,
        ) -> impl Future<Output = Result<Stanza, TransportError>> + Send {
            let reply = queue::ack(&stanza);
            self.requests.lock().unwrap().push(stanza);
            let outcome = match self.refuse_with.lock().unwrap().clone() {
                Some(e) => Err(e),
                None => Ok(reply),
            };
            ready(outcome)
        }

        fn send(&self, stanza: Stanza) -> Result<(), TransportError> {
            self.sent.lock().unwrap().push(stanza);
            Ok(())
        }
    }

    fn client(connection: &Arc<MockConnection>) -> QueueClient<MockConnection> {
        QueueClient::new(Arc::clone(connection), jid(QUEUE), jid(ROOM), &ClientIdAllocator::new())
    }

    fn info(id: &str, fields: &[InfoField]) -> Stanza {
        queue::info_push(id, &jid(QUEUE), &jid(ME), fields)
    }

    #[tokio::test]
    async fn join_sends_one_request_and_marks_joined() {
        let connection = Arc::new(MockConnection::default());
        let client = client(&connection);

        client.join().await.unwrap();
        assert!(client.is_joined());
        assert_eq!(connection.request_count(), 1);

        assert_eq!(client.join().await.unwrap_err(), QueueError::AlreadyJoined);
        assert_eq!(connection.request_count(), 1);
    }

    #[tokio::test]
    async fn refused_join_surfaces_remote_error() {
        let connection = Arc::new(MockConnection::default());
        let refusal = TransportError::Remote { condition: Condition::NotAllowed, text: None };
        *connection.refuse_with.lock().unwrap() = Some(refusal.clone());
        let client = client(&connection);

        assert_eq!(client.join().await.unwrap_err(), QueueError::Transport(refusal));
        assert!(!client.is_joined());

        // Failure clears the in-flight guard
        *connection.refuse_with.lock().unwrap() = None;
        client.join().await.unwrap();
        assert!(client.is_joined());
    }

    #[tokio::test]
    async fn leave_without_join_sends_nothing() {
        let connection = Arc::new(MockConnection::default());
        let client = client(&connection);

        assert_eq!(client.leave().await.unwrap_err(), QueueError::NotJoined);
        assert_eq!(connection.request_count(), 0);
    }

    #[tokio::test]
    async fn pushes_reach_listeners_and_are_acked() {
        let connection = Arc::new(MockConnection::default());
        let client = client(&connection);
        let seen = Arc::new(Mutex::new(Vec::new()));
        {
            let seen = Arc::clone(&seen);
            client.subscribe(QueueEventKind::Metrics, move |e| seen.lock().unwrap().push(e.clone()));
        }

        client.join().await.unwrap();
        let push = info("p1", &[InfoField::Position("3".into())]);
        assert_eq!(connection.deliver(&push), Some(Disposition::Handled));

        let sent = connection.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].stanza_type(), StanzaType::Result);
        assert_eq!(sent[0].id(), Some("p1"));

        assert_eq!(seen.lock().unwrap().len(), 1);
        assert_eq!(client.metrics().position.as_deref(), Some("3"));
    }

    #[tokio::test]
    async fn push_before_join_is_ignored() {
        let connection = Arc::new(MockConnection::default());
        let client = client(&connection);

        let push = queue::token_push("t1", &jid(QUEUE), &jid(ME), "abc");
        assert_eq!(connection.deliver(&push), Some(Disposition::Ignored));
        assert!(connection.sent().is_empty());
        drop(client);
    }

    #[tokio::test]
    async fn dispose_unregisters_once() {
        let connection = Arc::new(MockConnection::default());
        let client = client(&connection);
        client.subscribe(QueueEventKind::Token, |_| {});
        client.join().await.unwrap();

        client.dispose().unwrap();
        assert!(client.is_disposed());
        assert!(connection.handlers.lock().unwrap().is_empty());
        assert_eq!(connection.deliver(&info("p", &[])), None);

        client.dispose().unwrap();
        assert_eq!(client.join().await.unwrap_err(), QueueError::Disposed);
        assert_eq!(client.leave().await.unwrap_err(), QueueError::Disposed);
    }

    #[test]
    fn drop_unregisters_handler() {
        let connection = Arc::new(MockConnection::default());
        let client = client(&connection);
        assert_eq!(connection.handlers.lock().unwrap().len(), 1);

        drop(client);
        assert!(connection.handlers.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn listener_can_read_client_state() {
        let connection = Arc::new(MockConnection::default());
        let client = Arc::new(client(&connection));
        let observed = Arc::new(AtomicUsize::new(0));
        {
            let weak = Arc::downgrade(&client);
            let observed = Arc::clone(&observed);
            client.subscribe(QueueEventKind::Metrics, move |_| {
                if let Some(client) = weak.upgrade()
                    && client.metrics().position.as_deref() == Some("1")
                {
                    observed.fetch_add(1, Ordering::SeqCst);
                }
            });
        }

        client.join().await.unwrap();
        connection.deliver(&info("p", &[InfoField::Position("1".into())]));
        assert_eq!(observed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn ids_come_from_the_allocator() {
        let connection = Arc::new(MockConnection::default());
        let ids = ClientIdAllocator::starting_at(7);
        let a = QueueClient::new(Arc::clone(&connection), jid(QUEUE), jid(ROOM), &ids);
        let b = QueueClient::new(Arc::clone(&connection), jid(QUEUE), jid(ROOM), &ids);

        assert_eq!(a.id().get(), 7);
        assert_eq!(b.id().get(), 8);
        assert_eq!(a.queue(), jid(QUEUE));
        assert_eq!(a.room(), jid(ROOM));
    }
}
