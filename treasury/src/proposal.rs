//! Proposal state machine
//!
//! A proposal starts `Pending` and leaves that state exactly once, either to
//! `Executed` or `Cancelled`. Both terminal states are absorbing: no vote or
//! execution is accepted afterwards and the tallies are frozen.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::STAKE_WEIGHTED;
use crate::error::{Result, TreasuryError};

/// Stable proposal identity, assigned from a per-treasury counter
pub type ProposalId = u64;

/// A voter's choice
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Approve,
    Reject,
}

impl Decision {
    pub fn from_approve(approve: bool) -> Self {
        if approve {
            Decision::Approve
        } else {
            Decision::Reject
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ProposalStatus {
    /// Accepting votes
    Pending,
    /// Resolved in favour; value or asset released to the recipient
    Executed,
    /// Resolved against; any reservation released back to the treasury
    Cancelled,
}

impl ProposalStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ProposalStatus::Pending)
    }
}

/// What a proposal does once it passes
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProposalAction {
    /// Release `amount` of treasury balance to `recipient`
    Transfer { recipient: String, amount: u64 },
    /// Release a custodied asset to `recipient`
    AssetTransfer { recipient: String, asset_id: String },
    /// Stake-weighted motion; execution has no ledger effect
    Motion { description: String },
}

impl ProposalAction {
    /// Amount reserved in the treasury's locked balance while pending
    pub fn locked_amount(&self) -> u64 {
        match self {
            ProposalAction::Transfer { amount, .. } => *amount,
            _ => 0,
        }
    }
}

/// Time box and quorum of a stake-weighted proposal. Timestamps are in
/// milliseconds; votes are accepted while `voting_start <= now < voting_end`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct VotingWindow {
    pub minimal_votes_required: u64,
    pub voting_start: u64,
    pub voting_end: u64,
}

/// Result of evaluating equal-weight thresholds after a vote
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Execute,
    Cancel,
}

impl Resolution {
    pub fn status(&self) -> ProposalStatus {
        match self {
            Resolution::Execute => ProposalStatus::Executed,
            Resolution::Cancel => ProposalStatus::Cancelled,
        }
    }
}

/// Equal-weight threshold check.
///
/// Percentages are computed with truncating integer division and must strictly
/// exceed the threshold, so ties never resolve a proposal. Approval is checked
/// before cancellation.
pub fn evaluate_thresholds(
    approval_count: u64,
    cancellation_count: u64,
    member_count: u64,
    approval_threshold: u64,
    cancellation_threshold: u64,
) -> Option<Resolution> {
    if member_count == 0 {
        return None;
    }

    if approval_count.saturating_mul(100) / member_count > approval_threshold {
        Some(Resolution::Execute)
    } else if cancellation_count.saturating_mul(100) / member_count > cancellation_threshold {
        Some(Resolution::Cancel)
    } else {
        None
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Proposal {
    pub id: ProposalId,
    pub creator: String,
    pub action: ProposalAction,
    /// Each voter appears at most once
    pub votes: BTreeMap<String, Decision>,
    /// Approval weight; `votes_for` under the stake-weighted policy
    pub approval_count: u64,
    /// Rejection weight; `votes_against` under the stake-weighted policy
    pub cancellation_count: u64,
    pub status: ProposalStatus,
    /// Present only for stake-weighted proposals
    pub window: Option<VotingWindow>,
    pub created_at: u64,
    pub resolved_at: Option<u64>,
}

impl Proposal {
    pub fn new(id: ProposalId, creator: String, action: ProposalAction, created_at: u64) -> Self {
        Self {
            id,
            creator,
            action,
            votes: BTreeMap::new(),
            approval_count: 0,
            cancellation_count: 0,
            status: ProposalStatus::Pending,
            window: None,
            created_at,
            resolved_at: None,
        }
    }

    pub fn with_window(mut self, window: VotingWindow) -> Self {
        self.window = Some(window);
        self
    }

    pub fn is_pending(&self) -> bool {
        self.status == ProposalStatus::Pending
    }

    pub fn has_voted(&self, voter: &str) -> bool {
        self.votes.contains_key(voter)
    }

    /// Combined weight of all votes cast. `record_vote` keeps the sum in range.
    pub fn total_votes(&self) -> u64 {
        self.approval_count.saturating_add(self.cancellation_count)
    }

    /// Reject votes on a resolved proposal or from a voter already recorded
    pub fn ensure_can_vote(&self, voter: &str) -> Result<()> {
        if !self.is_pending() {
            return Err(TreasuryError::ProposalNotPending(self.id));
        }
        if self.has_voted(voter) {
            return Err(TreasuryError::DuplicateVote {
                proposal_id: self.id,
                voter: voter.to_string(),
            });
        }
        Ok(())
    }

    /// Tallies as they would stand after one more vote. Fails if either the
    /// tally or the combined weight would overflow.
    pub fn tally_with(&self, decision: Decision, weight: u64) -> Result<(u64, u64)> {
        let current = self.total_votes();
        if current.checked_add(weight).is_none() {
            return Err(TreasuryError::AmountOverflow {
                current,
                added: weight,
            });
        }
        Ok(match decision {
            Decision::Approve => (self.approval_count + weight, self.cancellation_count),
            Decision::Reject => (self.approval_count, self.cancellation_count + weight),
        })
    }

    pub fn record_vote(&mut self, voter: &str, decision: Decision, weight: u64) -> Result<()> {
        self.ensure_can_vote(voter)?;

        let (approvals, cancellations) = self.tally_with(decision, weight)?;
        self.approval_count = approvals;
        self.cancellation_count = cancellations;
        self.votes.insert(voter.to_string(), decision);
        Ok(())
    }

    /// Move out of `Pending`. Fails if the proposal already resolved.
    pub fn resolve(&mut self, status: ProposalStatus, now: u64) -> Result<()> {
        if !self.is_pending() {
            return Err(TreasuryError::ProposalNotPending(self.id));
        }
        self.status = status;
        self.resolved_at = Some(now);
        Ok(())
    }

    fn window(&self) -> Result<&VotingWindow> {
        self.window.as_ref().ok_or(TreasuryError::PolicyMismatch {
            required: STAKE_WEIGHTED,
        })
    }

    /// Validate a stake-weighted vote from `voter` carrying a record that
    /// targets `record_target`, at time `now`.
    pub fn ensure_stake_vote_allowed(
        &self,
        voter: &str,
        record_target: ProposalId,
        now: u64,
    ) -> Result<()> {
        let window = *self.window()?;

        if now >= window.voting_end {
            return Err(TreasuryError::VotingEnded {
                now,
                voting_end: window.voting_end,
            });
        }
        if record_target != self.id {
            return Err(TreasuryError::ProposalMismatch {
                proposal: self.id,
                record: record_target,
            });
        }
        self.ensure_can_vote(voter)?;
        if now < window.voting_start {
            return Err(TreasuryError::VotingNotStarted {
                now,
                voting_start: window.voting_start,
            });
        }
        Ok(())
    }

    /// Validate execution of a stake-weighted proposal at time `now`
    pub fn ensure_executable(&self, now: u64) -> Result<()> {
        match self.status {
            ProposalStatus::Executed => return Err(TreasuryError::AlreadyExecuted(self.id)),
            ProposalStatus::Cancelled => return Err(TreasuryError::ProposalNotPending(self.id)),
            ProposalStatus::Pending => {}
        }

        let window = *self.window()?;
        let cast = self.total_votes();
        if cast < window.minimal_votes_required {
            return Err(TreasuryError::InsufficientVotes {
                cast,
                required: window.minimal_votes_required,
            });
        }
        if now <= window.voting_end {
            return Err(TreasuryError::VotingNotEnded {
                now,
                voting_end: window.voting_end,
            });
        }
        Ok(())
    }

    /// Summarise the tally against the voting power that could have voted
    pub fn results(&self, total_possible_power: u64) -> VotingResults {
        VotingResults {
            proposal_id: self.id,
            approve_power: self.approval_count,
            reject_power: self.cancellation_count,
            total_votes: self.total_votes(),
            voter_count: self.votes.len(),
            total_possible_power,
        }
    }
}

/// Voting results summary
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VotingResults {
    pub proposal_id: ProposalId,
    pub approve_power: u64,
    pub reject_power: u64,
    pub total_votes: u64,
    pub voter_count: usize,
    pub total_possible_power: u64,
}

impl VotingResults {
    /// Approve weight as a percentage of weight cast
    pub fn approval_percentage(&self) -> u64 {
        if self.total_votes == 0 {
            return 0;
        }
        (u128::from(self.approve_power) * 100 / u128::from(self.total_votes)) as u64
    }

    /// Weight cast as a percentage of the possible weight. Zero when the
    /// possible weight is unbounded (stake-weighted).
    pub fn participation_rate(&self) -> u64 {
        if self.total_possible_power == 0 {
            return 0;
        }
        let rate = u128::from(self.total_votes) * 100 / u128::from(self.total_possible_power);
        u64::try_from(rate).unwrap_or(u64::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transfer(amount: u64) -> Proposal {
        Proposal::new(
            0,
            "alice".to_string(),
            ProposalAction::Transfer {
                recipient: "bob".to_string(),
                amount,
            },
            1_000,
        )
    }

    fn motion(window: VotingWindow) -> Proposal {
        Proposal::new(
            7,
            "alice".to_string(),
            ProposalAction::Motion {
                description: "Adopt the new logo".to_string(),
            },
            1_000,
        )
        .with_window(window)
    }

    #[test]
    fn test_threshold_is_strict() {
        // 2 of 4 is exactly 50%, which does not exceed 50
        assert_eq!(evaluate_thresholds(2, 0, 4, 50, 50), None);
        assert_eq!(evaluate_thresholds(3, 0, 4, 50, 50), Some(Resolution::Execute));
        assert_eq!(evaluate_thresholds(0, 2, 4, 50, 50), None);
        assert_eq!(evaluate_thresholds(0, 3, 4, 50, 50), Some(Resolution::Cancel));
    }

    #[test]
    fn test_threshold_truncates() {
        // 2 of 3 = 66.6% truncates to 66
        assert_eq!(evaluate_thresholds(2, 0, 3, 66, 50), None);
        assert_eq!(evaluate_thresholds(2, 0, 3, 65, 50), Some(Resolution::Execute));
    }

    #[test]
    fn test_threshold_approval_checked_first() {
        assert_eq!(evaluate_thresholds(1, 1, 1, 0, 0), Some(Resolution::Execute));
    }

    #[test]
    fn test_threshold_without_members() {
        assert_eq!(evaluate_thresholds(5, 5, 0, 0, 0), None);
    }

    #[test]
    fn test_hundred_percent_threshold_never_passes() {
        assert_eq!(evaluate_thresholds(4, 0, 4, 100, 100), None);
    }

    #[test]
    fn test_record_vote_and_duplicate() {
        let mut proposal = transfer(100);
        proposal.record_vote("alice", Decision::Approve, 1).unwrap();
        proposal.record_vote("bob", Decision::Reject, 1).unwrap();

        let err = proposal
            .record_vote("alice", Decision::Reject, 1)
            .unwrap_err();
        assert_eq!(
            err,
            TreasuryError::DuplicateVote {
                proposal_id: 0,
                voter: "alice".to_string()
            }
        );
        assert_eq!(proposal.approval_count, 1);
        assert_eq!(proposal.cancellation_count, 1);
        assert_eq!(proposal.votes.len(), 2);
    }

    #[test]
    fn test_terminal_states_absorb() {
        let mut proposal = transfer(100);
        proposal.resolve(ProposalStatus::Cancelled, 2_000).unwrap();

        assert!(proposal.status.is_terminal());
        assert_eq!(proposal.resolved_at, Some(2_000));
        assert_eq!(
            proposal.record_vote("carol", Decision::Approve, 1),
            Err(TreasuryError::ProposalNotPending(0))
        );
        assert_eq!(
            proposal.resolve(ProposalStatus::Executed, 3_000),
            Err(TreasuryError::ProposalNotPending(0))
        );
        assert_eq!(proposal.status, ProposalStatus::Cancelled);
    }

    #[test]
    fn test_stake_vote_check_order() {
        let proposal = motion(VotingWindow {
            minimal_votes_required: 10,
            voting_start: 1_000,
            voting_end: 2_000,
        });

        // Ended takes precedence over a mismatched record
        assert!(matches!(
            proposal.ensure_stake_vote_allowed("bob", 99, 2_000),
            Err(TreasuryError::VotingEnded { .. })
        ));
        assert!(matches!(
            proposal.ensure_stake_vote_allowed("bob", 99, 1_500),
            Err(TreasuryError::ProposalMismatch {
                proposal: 7,
                record: 99
            })
        ));
        assert!(matches!(
            proposal.ensure_stake_vote_allowed("bob", 7, 999),
            Err(TreasuryError::VotingNotStarted { .. })
        ));
        assert!(proposal.ensure_stake_vote_allowed("bob", 7, 1_000).is_ok());
        assert!(proposal.ensure_stake_vote_allowed("bob", 7, 1_999).is_ok());
    }

    #[test]
    fn test_inverted_window_never_accepts_votes() {
        let proposal = motion(VotingWindow {
            minimal_votes_required: 0,
            voting_start: 5_000,
            voting_end: 4_000,
        });

        assert!(matches!(
            proposal.ensure_stake_vote_allowed("bob", 7, 4_500),
            Err(TreasuryError::VotingEnded { .. })
        ));
        assert!(matches!(
            proposal.ensure_stake_vote_allowed("bob", 7, 3_000),
            Err(TreasuryError::VotingNotStarted { .. })
        ));
    }

    #[test]
    fn test_executable_checks_votes_before_time() {
        let mut proposal = motion(VotingWindow {
            minimal_votes_required: 100,
            voting_start: 1_000,
            voting_end: 2_000,
        });

        assert_eq!(
            proposal.ensure_executable(5_000),
            Err(TreasuryError::InsufficientVotes {
                cast: 0,
                required: 100
            })
        );

        proposal.record_vote("bob", Decision::Approve, 60).unwrap();
        proposal.record_vote("carol", Decision::Reject, 50).unwrap();

        assert_eq!(
            proposal.ensure_executable(2_000),
            Err(TreasuryError::VotingNotEnded {
                now: 2_000,
                voting_end: 2_000
            })
        );
        assert!(proposal.ensure_executable(2_001).is_ok());

        proposal.resolve(ProposalStatus::Executed, 2_001).unwrap();
        assert_eq!(
            proposal.ensure_executable(3_000),
            Err(TreasuryError::AlreadyExecuted(7))
        );
    }

    #[test]
    fn test_executable_requires_window() {
        let proposal = transfer(5);
        assert!(matches!(
            proposal.ensure_executable(10),
            Err(TreasuryError::PolicyMismatch { .. })
        ));
    }

    #[test]
    fn test_voting_results() {
        let mut proposal = transfer(100);
        proposal.record_vote("a", Decision::Approve, 1).unwrap();
        proposal.record_vote("b", Decision::Approve, 1).unwrap();
        proposal.record_vote("c", Decision::Reject, 1).unwrap();

        let results = proposal.results(4);
        assert_eq!(results.total_votes, 3);
        assert_eq!(results.voter_count, 3);
        assert_eq!(results.approval_percentage(), 66);
        assert_eq!(results.participation_rate(), 75);
        assert_eq!(proposal.results(0).participation_rate(), 0);
    }

    #[test]
    fn test_tally_overflow_rejects_vote() {
        let mut proposal = transfer(100);
        proposal
            .record_vote("whale", Decision::Approve, u64::MAX - 10)
            .unwrap();

        assert_eq!(
            proposal.record_vote("minnow", Decision::Reject, 11),
            Err(TreasuryError::AmountOverflow {
                current: u64::MAX - 10,
                added: 11
            })
        );
        assert_eq!(proposal.cancellation_count, 0);
        assert!(!proposal.has_voted("minnow"));

        proposal.record_vote("minnow", Decision::Reject, 10).unwrap();
        assert_eq!(proposal.total_votes(), u64::MAX);
    }

    #[test]
    fn test_voting_results_with_large_weights() {
        let mut proposal = transfer(100);
        proposal
            .record_vote("whale", Decision::Approve, u64::MAX / 50)
            .unwrap();

        let results = proposal.results(0);
        assert_eq!(results.approval_percentage(), 100);

        proposal
            .record_vote("shark", Decision::Reject, u64::MAX / 50)
            .unwrap();
        let results = proposal.results(1);
        assert_eq!(results.approval_percentage(), 50);
        assert_eq!(results.participation_rate(), u64::MAX);
    }
}
