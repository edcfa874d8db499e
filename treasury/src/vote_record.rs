//! Single-use vote records for the stake-weighted policy

use thiserror::Error;

use crate::error::TreasuryError;
use crate::ledger::Coin;
use crate::proposal::{Decision, ProposalId};

/// A weighted vote waiting to be cast.
///
/// Voting power equals the staked value. The stake only weights the vote: it
/// is handed back in full when the record is consumed. A record cannot be
/// cloned or split.
#[derive(Debug)]
pub struct VoteRecord {
    proposal_id: ProposalId,
    stake: Coin,
    decision: Decision,
}

impl VoteRecord {
    pub fn new(proposal_id: ProposalId, stake: Coin, decision: Decision) -> Self {
        Self {
            proposal_id,
            stake,
            decision,
        }
    }

    pub fn proposal_id(&self) -> ProposalId {
        self.proposal_id
    }

    pub fn decision(&self) -> Decision {
        self.decision
    }

    pub fn voting_power(&self) -> u64 {
        self.stake.value()
    }

    /// Destroy the record and return its stake
    pub fn into_stake(self) -> Coin {
        self.stake
    }
}

/// A rejected stake vote. The record comes back untouched so the caller can
/// recover the stake or retry.
#[derive(Error, Debug)]
#[error("vote rejected: {error}")]
pub struct VoteError {
    #[source]
    pub error: TreasuryError,
    pub record: VoteRecord,
}

impl VoteError {
    pub fn new(error: TreasuryError, record: VoteRecord) -> Self {
        Self { error, record }
    }

    pub fn into_parts(self) -> (TreasuryError, VoteRecord) {
        (self.error, self.record)
    }
}
