//! Notifications emitted for external observers. They carry no control-flow
//! significance: the engine never reads them back.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::proposal::{Decision, ProposalId};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TreasuryEvent {
    ProposalCreated {
        wallet_id: String,
        proposal_id: ProposalId,
        creator: String,
    },
    VoteCast {
        wallet_id: String,
        proposal_id: ProposalId,
        voter: String,
        decision: Decision,
        weight: u64,
    },
    ProposalExecuted {
        wallet_id: String,
        proposal_id: ProposalId,
    },
    ProposalCancelled {
        wallet_id: String,
        proposal_id: ProposalId,
    },
    CollectibleMinted {
        wallet_id: String,
        collectible_id: String,
        donor: String,
        amount: u64,
    },
    MemberAdded {
        wallet_id: String,
        member: String,
    },
}

/// Receiver of [`TreasuryEvent`]s.
///
/// Events are emitted after the treasury lock is released. Events from one
/// call arrive in order, but events from concurrent calls may interleave: a
/// `VoteCast` can be observed after the `ProposalExecuted` it contributed to.
/// Read the treasury state when an exact ordering matters.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &TreasuryEvent);
}

/// Writes every event to the log as JSON
#[derive(Debug, Clone, Copy, Default)]
pub struct LogEventSink;

impl EventSink for LogEventSink {
    fn emit(&self, event: &TreasuryEvent) {
        match serde_json::to_string(event) {
            Ok(json) => log::info!("📣 {}", json),
            Err(e) => log::warn!("Failed to serialize event {:?}: {}", event, e),
        }
    }
}

/// Keeps every emitted event in memory
#[derive(Debug, Default)]
pub struct EventLog {
    events: Mutex<Vec<TreasuryEvent>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<TreasuryEvent> {
        self.events.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl EventSink for EventLog {
    fn emit(&self, event: &TreasuryEvent) {
        self.events.lock().push(event.clone());
    }
}
