//! Quorum Treasury
//!
//! A shared treasury controlled by its members. Value and assets only leave
//! the treasury through proposals that reach a quorum:
//! - equal-weight: one vote per member, a proposal resolves as soon as its
//!   approvals or rejections strictly exceed a percentage of the membership
//! - stake-weighted: voting power equals staked value, votes are accepted
//!   inside a time window and a motion executes once enough weight was cast
//!
//! Amounts reserved by pending transfer proposals are tracked as the locked
//! balance and cannot be proposed twice.

pub mod clock;
pub mod config;
pub mod error;
pub mod events;
pub mod governance;
pub mod ledger;
pub mod proposal;
pub mod store;
pub mod treasury;
pub mod vote_record;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{
    CollectibleTemplate, TreasuryConfig, VotingPolicy, DEFAULT_APPROVAL_THRESHOLD,
    DEFAULT_CANCELLATION_THRESHOLD,
};
pub use error::{Result, TreasuryError};
pub use events::{EventLog, EventSink, LogEventSink, TreasuryEvent};
pub use governance::{Governance, ProposalRequest, Services};
pub use ledger::{
    Asset, Balance, Coin, Collectible, Holdings, InMemoryLedger, LoggingPayout,
    MembershipBadge, Payload, Payout,
};
pub use proposal::{
    evaluate_thresholds, Decision, Proposal, ProposalAction, ProposalId, ProposalStatus,
    Resolution, VotingResults, VotingWindow,
};
pub use store::SnapshotStore;
pub use treasury::{HeldAsset, Release, Transition, Treasury, TreasuryStats, MEMBER_VOTE_WEIGHT};
pub use vote_record::{VoteError, VoteRecord};
