//! Session configuration.

/// What a successful `leave` does to local membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LeavePolicy {
    /// Membership stays `Joined` after the leave is acknowledged.
    ///
    /// A following `join` still fails with `AlreadyJoined` and pushes keep
    /// being acknowledged until the client is disposed.
    #[default]
    KeepMembership,

    /// Membership drops to `NotJoined` and metrics are cleared once the leave
    /// is acknowledged, allowing a fresh `join`.
    ResetMembership,
}

/// Queue session configuration.
#[derive(Debug, Clone, Default)]
pub struct QueueConfig {
    /// Membership handling after `leave`
    pub leave_policy: LeavePolicy,
}

impl QueueConfig {
    /// Configuration with the given leave policy.
    pub fn with_leave_policy(leave_policy: LeavePolicy) -> Self {
        Self { leave_policy }
    }
}
