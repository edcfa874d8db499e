//! Treasury error types

use thiserror::Error;

use crate::proposal::ProposalId;

/// Errors raised by treasury governance operations.
///
/// Every error aborts the call that raised it; the treasury is left exactly as
/// it was before the call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TreasuryError {
    #[error("{0} is not a member of the treasury")]
    NotAMember(String),

    #[error("{0} is not the treasury owner")]
    NotOwner(String),

    #[error("Proposal {0} is no longer pending")]
    ProposalNotPending(ProposalId),

    #[error("{voter} has already voted on proposal {proposal_id}")]
    DuplicateVote {
        proposal_id: ProposalId,
        voter: String,
    },

    #[error("Proposal {0} has already been executed")]
    AlreadyExecuted(ProposalId),

    #[error("Voting has not started: now {now}, starts at {voting_start}")]
    VotingNotStarted { now: u64, voting_start: u64 },

    #[error("Voting has ended: now {now}, ended at {voting_end}")]
    VotingEnded { now: u64, voting_end: u64 },

    #[error("Voting has not ended: now {now}, ends at {voting_end}")]
    VotingNotEnded { now: u64, voting_end: u64 },

    #[error("Vote record targets proposal {record}, not proposal {proposal}")]
    ProposalMismatch {
        proposal: ProposalId,
        record: ProposalId,
    },

    #[error("Asset {asset_id} is held by {holder}, not {caller}")]
    AssetOwnershipMismatch {
        asset_id: String,
        holder: String,
        caller: String,
    },

    #[error("Asset {0} is already locked by a pending proposal")]
    AssetLocked(String),

    #[error("Asset {0} is already in custody")]
    DuplicateAsset(String),

    #[error("Asset not found: {0}")]
    AssetNotFound(String),

    #[error("Operation requires the {required} voting policy")]
    PolicyMismatch { required: &'static str },

    #[error("Insufficient treasury balance: requested {requested}, available {available}")]
    InsufficientBalance { requested: u64, available: u64 },

    #[error("Insufficient votes: {cast} cast, {required} required")]
    InsufficientVotes { cast: u64, required: u64 },

    #[error("Proposal index {index} out of range ({len} proposals)")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Proposal not found: {0}")]
    ProposalNotFound(ProposalId),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Amount overflow: {current} + {added} exceeds u64")]
    AmountOverflow { current: u64, added: u64 },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Treasury invariant violated: {0}")]
    InvariantViolation(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

pub type Result<T> = std::result::Result<T, TreasuryError>;
