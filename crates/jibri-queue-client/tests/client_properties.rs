//! Property-based tests for the queue client.
//!
//! Arbitrary interleavings of calls and pushes are run against a client on the
//! in-memory connection. Whatever the order, rejected calls never reach the
//! network and every push is either acknowledged once or not at all.

use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use jibri_queue_client::{
    ClientIdAllocator, Disposition, LeavePolicy, QueueClient, QueueConfig, QueueError,
    QueueEventKind,
};
use jibri_queue_core::Jid;
use jibri_queue_proto::queue::{self, InfoField};
use jibri_queue_sim::{Reply, SimConnection};
use proptest::prelude::*;

const QUEUE: &str = "jibriqueue@svc.example";
const ROOM: &str = "room@conference.example";
const ME: &str = "focus@auth.example/focus";

#[derive(Debug, Clone)]
enum Op {
    Join,
    Leave,
    Refuse(bool),
    Info(u8),
    Token,
    Dispose,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => Just(Op::Join),
        2 => Just(Op::Leave),
        1 => any::<bool>().prop_map(Op::Refuse),
        4 => (0u8..4).prop_map(Op::Info),
        2 => Just(Op::Token),
        1 => Just(Op::Dispose),
    ]
}

fn jid(s: &str) -> Jid {
    s.parse().unwrap()
}

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(future)
}

fn run(ops: Vec<Op>, policy: LeavePolicy) -> Result<(), TestCaseError> {
    let connection = Arc::new(SimConnection::new(jid(ME)));
    let client = QueueClient::with_config(
        Arc::clone(&connection),
        jid(QUEUE),
        jid(ROOM),
        QueueConfig::with_leave_policy(policy),
        &ClientIdAllocator::new(),
    );
    let tokens = Arc::new(AtomicUsize::new(0));
    {
        let tokens = Arc::clone(&tokens);
        client.subscribe(QueueEventKind::Token, move |_| {
            tokens.fetch_add(1, Ordering::SeqCst);
        });
    }

    let mut expected_tokens = 0;
    let mut disposed = false;

    for (i, op) in ops.into_iter().enumerate() {
        let id = i.to_string();
        let requests_before = connection.requests().len();
        let acks_before = connection.sent().len();
        let was_joined = client.is_joined();

        match op {
            Op::Join => {
                let result = block_on(client.join());
                let sent = connection.requests().len() - requests_before;
                match &result {
                    Err(e) if e.is_precondition() => prop_assert_eq!(sent, 0),
                    _ => prop_assert_eq!(sent, 1),
                }
                if disposed {
                    prop_assert_eq!(result, Err(QueueError::Disposed));
                } else if was_joined {
                    prop_assert_eq!(result, Err(QueueError::AlreadyJoined));
                }
            },
            Op::Leave => {
                let result = block_on(client.leave());
                let sent = connection.requests().len() - requests_before;
                match &result {
                    Err(e) if e.is_precondition() => prop_assert_eq!(sent, 0),
                    _ => prop_assert_eq!(sent, 1),
                }
                if !disposed && !was_joined {
                    prop_assert_eq!(result, Err(QueueError::NotJoined));
                }
            },
            Op::Refuse(refuse) => {
                let reply = if refuse { Reply::Fail("refused".into()) } else { Reply::Accept };
                connection.set_reply(reply);
            },
            Op::Info(position) => {
                let fields = [InfoField::Position(position.to_string())];
                let push = queue::info_push(&id, &jid(QUEUE), &jid(ME), &fields);
                let disposition = connection.deliver(&push);
                let acks = connection.sent().len() - acks_before;

                match disposition {
                    Some(Disposition::Handled) => prop_assert_eq!(acks, 1),
                    _ => prop_assert_eq!(acks, 0),
                }
                let handled = disposition == Some(Disposition::Handled);
                prop_assert_eq!(handled, was_joined && !disposed);
            },
            Op::Token => {
                let push = queue::token_push(&id, &jid(QUEUE), &jid(ME), "abc");
                if connection.deliver(&push) == Some(Disposition::Handled) {
                    expected_tokens += 1;
                }
            },
            Op::Dispose => {
                prop_assert!(client.dispose().is_ok());
                disposed = true;
                prop_assert_eq!(connection.handler_count(), 0);
            },
        }

        prop_assert_eq!(tokens.load(Ordering::SeqCst), expected_tokens);
    }

    Ok(())
}

proptest! {
    #[test]
    fn prop_client_contract(ops in prop::collection::vec(op_strategy(), 0..40)) {
        run(ops, LeavePolicy::KeepMembership)?;
    }

    #[test]
    fn prop_client_contract_with_reset(ops in prop::collection::vec(op_strategy(), 0..40)) {
        run(ops, LeavePolicy::ResetMembership)?;
    }
}
