//! Per-slot request sequence numbers. A response is applied only if no
//! newer request for the same slot was issued after it.

use serde::{Deserialize, Serialize};

/// A region of the dashboard filled by one kind of fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Slot {
    User,
    Status,
    Catalog,
    History,
}

impl Slot {
    pub const ALL: [Slot; 4] = [Slot::User, Slot::Status, Slot::Catalog, Slot::History];

    fn index(self) -> usize {
        match self {
            Slot::User => 0,
            Slot::Status => 1,
            Slot::Catalog => 2,
            Slot::History => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Slot::User => "user",
            Slot::Status => "status",
            Slot::Catalog => "catalog",
            Slot::History => "history",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    pub slot: Slot,
    pub seq: u64,
}

#[derive(Debug, Default)]
pub struct RequestSeq {
    latest: [u64; 4],
    completed: [u64; 4],
}

impl RequestSeq {
    pub fn issue(&mut self, slot: Slot) -> Ticket {
        let i = slot.index();
        self.latest[i] += 1;
        Ticket {
            slot,
            seq: self.latest[i],
        }
    }

    /// True if `ticket` is still the newest issued for its slot.
    pub fn is_current(&self, ticket: &Ticket) -> bool {
        self.latest[ticket.slot.index()] == ticket.seq
    }

    /// Record a completion; returns whether the result should be applied.
    pub fn complete(&mut self, ticket: &Ticket) -> bool {
        let i = ticket.slot.index();
        if ticket.seq > self.completed[i] {
            self.completed[i] = ticket.seq;
        }
        self.is_current(ticket)
    }

    /// Slots with a request still in flight.
    pub fn pending(&self) -> Vec<Slot> {
        Slot::ALL
            .into_iter()
            .filter(|s| self.completed[s.index()] < self.latest[s.index()])
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newer_ticket_supersedes_older() {
        let mut seq = RequestSeq::default();
        let first = seq.issue(Slot::Catalog);
        let second = seq.issue(Slot::Catalog);
        assert!(!seq.is_current(&first));
        assert!(seq.is_current(&second));

        // Out-of-order arrival: newest first, then the stale one.
        assert!(seq.complete(&second));
        assert!(!seq.complete(&first));
        assert!(seq.pending().is_empty());
    }

    #[test]
    fn slots_are_independent() {
        let mut seq = RequestSeq::default();
        let status = seq.issue(Slot::Status);
        let _history = seq.issue(Slot::History);
        assert!(seq.is_current(&status));
        assert_eq!(seq.pending(), vec![Slot::Status, Slot::History]);
        seq.complete(&status);
        assert_eq!(seq.pending(), vec![Slot::History]);
    }
}
