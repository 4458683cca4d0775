//! Instance identifiers.

use std::{
    fmt,
    sync::atomic::{AtomicU64, Ordering},
};

/// Sequence number identifying one [`crate::QueueClient`] instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(u64);

impl ClientId {
    /// Raw sequence number.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Monotonic allocator of [`ClientId`]s.
///
/// Callers that want isolated numbering (tests, several independent
/// subsystems) own an allocator and pass it to the client constructor. Callers
/// that want one numbering per process use [`ClientIdAllocator::process`].
#[derive(Debug)]
pub struct ClientIdAllocator {
    next: AtomicU64,
}

static PROCESS: ClientIdAllocator = ClientIdAllocator::new();

impl ClientIdAllocator {
    /// Allocator whose first id is 0.
    pub const fn new() -> Self {
        Self::starting_at(0)
    }

    /// Allocator whose first id is `first`.
    pub const fn starting_at(first: u64) -> Self {
        Self { next: AtomicU64::new(first) }
    }

    /// Hand out the next id. Never returns the same id twice.
    pub fn next(&self) -> ClientId {
        ClientId(self.next.fetch_add(1, Ordering::Relaxed))
    }

    /// Process-wide allocator.
    ///
    /// Initialized at compile time, before any client exists, and never reset.
    /// Ids from it are unique for the lifetime of the process.
    pub fn process() -> &'static Self {
        &PROCESS
    }
}

impl Default for ClientIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}
