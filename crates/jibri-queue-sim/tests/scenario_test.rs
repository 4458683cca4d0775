//! End-to-end scenarios against the simulated queue service.
//!
//! A client joins behind `ahead` anonymous rooms and is advanced until served.
//! The number of pushes, events, and acknowledgments follows from `ahead`
//! alone, whatever the seed.

use jibri_queue_client::ClientIdAllocator;
use jibri_queue_core::{Jid, LeavePolicy};
use jibri_queue_sim::{ScenarioConfig, ScenarioError, scenario};
use proptest::prelude::*;

fn jid(s: &str) -> Jid {
    s.parse().unwrap()
}

fn config(ahead: usize, seed: u64, leave_policy: LeavePolicy) -> ScenarioConfig {
    ScenarioConfig {
        queue: jid("jibriqueue@jibri.sim"),
        room: jid("room@conference.sim"),
        local: jid("focus@auth.sim/focus"),
        ahead,
        seed,
        leave_policy,
        max_rounds: 100,
    }
}

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(future)
}

#[tokio::test]
async fn served_immediately_with_empty_queue() {
    let report =
        scenario::run(config(0, 1, LeavePolicy::KeepMembership), &ClientIdAllocator::new())
            .await
            .unwrap();

    assert_eq!(report.rounds, 1);
    assert!(report.metrics.is_empty());
    assert_eq!(report.acks, 1);
    assert_eq!(report.token.len(), 16);
}

#[tokio::test]
async fn positions_count_down() {
    let report =
        scenario::run(config(3, 9, LeavePolicy::KeepMembership), &ClientIdAllocator::new())
            .await
            .unwrap();

    let positions: Vec<_> =
        report.metrics.iter().map(|m| m.position.clone().unwrap_or_default()).collect();
    assert_eq!(positions, vec!["3", "2", "1"]);
    assert!(report.joined_after_leave);
}

#[tokio::test]
async fn reset_policy_reports_not_joined_after_leave() {
    let report =
        scenario::run(config(1, 9, LeavePolicy::ResetMembership), &ClientIdAllocator::new())
            .await
            .unwrap();

    assert!(!report.joined_after_leave);
}

#[tokio::test]
async fn stalls_when_rounds_run_out() {
    let mut config = config(5, 0, LeavePolicy::KeepMembership);
    config.max_rounds = 2;

    let err = scenario::run(config, &ClientIdAllocator::new()).await.unwrap_err();
    assert!(matches!(err, ScenarioError::Stalled { rounds: 2 }));
}

#[tokio::test]
async fn client_ids_follow_the_allocator() {
    let ids = ClientIdAllocator::starting_at(10);
    let first = scenario::run(config(0, 0, LeavePolicy::KeepMembership), &ids).await.unwrap();
    let second = scenario::run(config(0, 0, LeavePolicy::KeepMembership), &ids).await.unwrap();

    assert_eq!(first.client.get(), 10);
    assert_eq!(second.client.get(), 11);
}

proptest! {
    #[test]
    fn prop_one_update_per_round_then_token(ahead in 0usize..12, seed in any::<u64>()) {
        let report = block_on(scenario::run(
            config(ahead, seed, LeavePolicy::KeepMembership),
            &ClientIdAllocator::new(),
        ))
        .unwrap();

        prop_assert_eq!(report.rounds, ahead + 1);
        prop_assert_eq!(report.metrics.len(), ahead);
        prop_assert_eq!(report.acks, ahead + 1);
    }

    #[test]
    fn prop_same_seed_same_report(ahead in 0usize..6, seed in any::<u64>()) {
        let run = || {
            block_on(scenario::run(
                config(ahead, seed, LeavePolicy::ResetMembership),
                &ClientIdAllocator::new(),
            ))
            .unwrap()
        };

        prop_assert_eq!(run(), run());
    }
}
