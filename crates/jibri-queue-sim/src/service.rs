//! Scripted remote queue service.
//!
//! Keeps an ordered waiting list and answers join/leave requests the way the
//! real service does. Each [`SimQueueService::advance`] serves the head of the
//! line: a served client receives a `token` push and every client still
//! waiting receives an `info` push with its new position and estimate.
//!
//! Estimates come from a seeded [`ChaCha8Rng`], so a given seed always
//! produces the same sequence of pushes.

use jibri_queue_proto::{
    Condition, Jid, Stanza,
    queue::{self, InfoField, NS_JIBRI_QUEUE},
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Bounds of the simulated service time per queue slot, in seconds.
const SLOT_SECONDS: std::ops::RangeInclusive<u64> = 20..=40;

/// One entry of the waiting list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    /// Address pushes go to; `None` for simulated strangers
    pub address: Option<Jid>,
    /// Room the slot is for
    pub room: Jid,
}

/// Remote queue model.
#[derive(Debug)]
pub struct SimQueueService {
    jid: Jid,
    members: Vec<Member>,
    rng: ChaCha8Rng,
    next_push: u64,
    served: u64,
}

impl SimQueueService {
    /// Empty queue at `jid` with deterministic estimates from `seed`.
    pub fn new(jid: Jid, seed: u64) -> Self {
        Self {
            jid,
            members: Vec::new(),
            rng: ChaCha8Rng::seed_from_u64(seed),
            next_push: 0,
            served: 0,
        }
    }

    /// Waiting list, head first.
    pub fn members(&self) -> &[Member] {
        &self.members
    }

    /// Number of clients served so far.
    pub fn served(&self) -> u64 {
        self.served
    }

    /// 1-based position of `address`, if waiting.
    pub fn position_of(&self, address: &Jid) -> Option<usize> {
        self.members.iter().position(|m| m.address.as_ref() == Some(address)).map(|i| i + 1)
    }

    /// Put `count` anonymous members in line. They never receive pushes.
    pub fn add_waiting(&mut self, count: usize) {
        for n in 0..count {
            let room = Jid::parse(&format!("waiting-{n}@conference.sim.invalid"));
            if let Ok(room) = room {
                self.members.push(Member { address: None, room });
            }
        }
    }

    /// Apply a join or leave request.
    ///
    /// # Errors
    ///
    /// - `Condition::BadRequest` for a missing sender, payload, or room
    /// - `Condition::NotAllowed` for a join from an address already waiting
    /// - `Condition::ServiceUnavailable` for any other action
    pub fn handle_request(&mut self, request: &Stanza) -> Result<(), Condition> {
        let from = request.from().ok_or(Condition::BadRequest)?;
        let payload = queue::payload(request).ok_or(Condition::BadRequest)?;

        match payload.attr("action") {
            Some("join") => {
                let room = payload
                    .attr("room")
                    .and_then(|room| Jid::parse(room).ok())
                    .ok_or(Condition::BadRequest)?;

                if self.position_of(from).is_some() {
                    return Err(Condition::NotAllowed);
                }

                self.members.push(Member { address: Some(from.clone()), room });
                tracing::debug!(%from, position = self.members.len(), "member joined");
                Ok(())
            },
            Some("leave") => {
                self.members.retain(|m| m.address.as_ref() != Some(from));
                tracing::debug!(%from, "member left");
                Ok(())
            },
            _ => Err(Condition::ServiceUnavailable),
        }
    }

    /// Serve the head of the line and produce the resulting pushes.
    pub fn advance(&mut self) -> Vec<Stanza> {
        let mut pushes = Vec::new();

        if self.members.is_empty() {
            return pushes;
        }

        let head = self.members.remove(0);
        self.served += 1;

        if let Some(address) = &head.address {
            let token = format!("{:016x}", self.rng.r#gen::<u64>());
            tracing::debug!(%address, room = %head.room, "serving member");
            let id = self.push_id();
            pushes.push(queue::token_push(&id, &self.jid, address, &token));
        }

        let slot = self.rng.gen_range(SLOT_SECONDS);
        let waiting: Vec<(usize, Jid)> = self
            .members
            .iter()
            .enumerate()
            .filter_map(|(i, m)| m.address.clone().map(|a| (i + 1, a)))
            .collect();

        for (position, address) in waiting {
            let eta = slot.saturating_mul(u64::try_from(position).unwrap_or(u64::MAX));
            let fields =
                [InfoField::Position(position.to_string()), InfoField::Time(eta.to_string())];
            let id = self.push_id();
            pushes.push(queue::info_push(&id, &self.jid, &address, &fields));
        }

        pushes
    }

    /// True if `stanza` is addressed to this service in its namespace.
    pub fn accepts(&self, stanza: &Stanza) -> bool {
        stanza.to().is_some_and(|to| to.bare_eq(&self.jid))
            && stanza.has_namespace(NS_JIBRI_QUEUE)
    }

    fn push_id(&mut self) -> String {
        let id = format!("queue-{}", self.next_push);
        self.next_push += 1;
        id
    }
}
