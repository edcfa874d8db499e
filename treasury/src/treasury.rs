//! Treasury aggregate
//!
//! Owns the balance, membership, asset custody and every proposal. All
//! mutation goes through methods that validate first and mutate second, so a
//! failed call leaves the treasury untouched.
//!
//! Invariants:
//! - `locked_balance <= balance`
//! - `locked_balance` equals the sum of `amount` over pending transfer proposals
//! - a custodied asset is locked by at most one pending asset proposal

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::config::{VotingPolicy, EQUAL_WEIGHT, STAKE_WEIGHTED};
use crate::error::{Result, TreasuryError};
use crate::ledger::{Asset, Balance, Coin, Payload};
use crate::proposal::{
    evaluate_thresholds, Decision, Proposal, ProposalAction, ProposalId, ProposalStatus,
    Resolution, VotingResults, VotingWindow,
};

/// Weight of one member's vote under the equal-weight policy
pub const MEMBER_VOTE_WEIGHT: u64 = 1;

/// An asset in treasury custody
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HeldAsset {
    pub asset: Asset,
    /// Identity recorded as holder when the asset was deposited
    pub holder: String,
    /// Pending proposal that reserves this asset
    pub locked_by: Option<ProposalId>,
}

/// Value or asset leaving the treasury because a proposal executed
#[derive(Debug, PartialEq)]
pub struct Release {
    pub recipient: String,
    pub payload: Payload,
}

/// State of a proposal after a create or vote call
#[derive(Debug, PartialEq)]
pub struct Transition {
    pub proposal_id: ProposalId,
    pub status: ProposalStatus,
    pub release: Option<Release>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TreasuryStats {
    pub balance: u64,
    pub locked_balance: u64,
    pub available_balance: u64,
    pub member_count: usize,
    pub pending_proposals: usize,
    pub executed_proposals: usize,
    pub cancelled_proposals: usize,
    pub assets_in_custody: usize,
    pub donations_received: u64,
    pub collectibles_minted: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Treasury {
    wallet_id: String,
    owner: String,
    policy: VotingPolicy,
    members: BTreeSet<String>,
    balance: Balance,
    locked_balance: u64,
    assets: BTreeMap<String, HeldAsset>,
    proposals: BTreeMap<ProposalId, Proposal>,
    next_proposal_id: ProposalId,
    donations_received: u64,
    collectibles_minted: u64,
    created_at: u64,
}

impl Treasury {
    /// Empty treasury with the owner as its only member
    pub fn new(wallet_id: String, owner: String, policy: VotingPolicy, created_at: u64) -> Self {
        let mut members = BTreeSet::new();
        members.insert(owner.clone());

        Self {
            wallet_id,
            owner,
            policy,
            members,
            balance: Balance::default(),
            locked_balance: 0,
            assets: BTreeMap::new(),
            proposals: BTreeMap::new(),
            next_proposal_id: 0,
            donations_received: 0,
            collectibles_minted: 0,
            created_at,
        }
    }

    pub fn wallet_id(&self) -> &str {
        &self.wallet_id
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn policy(&self) -> VotingPolicy {
        self.policy
    }

    pub fn created_at(&self) -> u64 {
        self.created_at
    }

    pub fn members(&self) -> impl Iterator<Item = &String> {
        self.members.iter()
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub fn is_member(&self, identity: &str) -> bool {
        self.members.contains(identity)
    }

    pub fn balance(&self) -> u64 {
        self.balance.value()
    }

    pub fn locked_balance(&self) -> u64 {
        self.locked_balance
    }

    /// Balance not reserved by pending proposals
    pub fn available_balance(&self) -> u64 {
        self.balance.value().saturating_sub(self.locked_balance)
    }

    pub fn asset(&self, asset_id: &str) -> Option<&HeldAsset> {
        self.assets.get(asset_id)
    }

    pub fn proposal(&self, id: ProposalId) -> Result<&Proposal> {
        self.proposals
            .get(&id)
            .ok_or(TreasuryError::ProposalNotFound(id))
    }

    /// Positional lookup in creation order
    pub fn proposal_at(&self, index: usize) -> Result<&Proposal> {
        self.proposals
            .values()
            .nth(index)
            .ok_or(TreasuryError::IndexOutOfRange {
                index,
                len: self.proposals.len(),
            })
    }

    /// All proposals in creation order
    pub fn proposals(&self) -> Vec<&Proposal> {
        self.proposals.values().collect()
    }

    pub fn proposals_by_status(&self, status: ProposalStatus) -> Vec<&Proposal> {
        self.proposals
            .values()
            .filter(|p| p.status == status)
            .collect()
    }

    /// Tally summary. Possible power is the membership size under the
    /// equal-weight policy and unbounded (reported as zero) otherwise.
    pub fn voting_results(&self, id: ProposalId) -> Result<VotingResults> {
        let possible = match self.policy {
            VotingPolicy::EqualWeight { .. } => self.members.len() as u64 * MEMBER_VOTE_WEIGHT,
            VotingPolicy::StakeWeighted => 0,
        };
        Ok(self.proposal(id)?.results(possible))
    }

    pub fn stats(&self) -> TreasuryStats {
        let count = |status| self.proposals.values().filter(|p| p.status == status).count();

        TreasuryStats {
            balance: self.balance(),
            locked_balance: self.locked_balance,
            available_balance: self.available_balance(),
            member_count: self.members.len(),
            pending_proposals: count(ProposalStatus::Pending),
            executed_proposals: count(ProposalStatus::Executed),
            cancelled_proposals: count(ProposalStatus::Cancelled),
            assets_in_custody: self.assets.len(),
            donations_received: self.donations_received,
            collectibles_minted: self.collectibles_minted,
        }
    }

    pub fn ensure_member(&self, identity: &str) -> Result<()> {
        if !self.is_member(identity) {
            return Err(TreasuryError::NotAMember(identity.to_string()));
        }
        Ok(())
    }

    pub fn ensure_owner(&self, identity: &str) -> Result<()> {
        if self.owner != identity {
            return Err(TreasuryError::NotOwner(identity.to_string()));
        }
        Ok(())
    }

    fn thresholds(&self) -> Result<(u64, u64)> {
        match self.policy {
            VotingPolicy::EqualWeight {
                approval_threshold,
                cancellation_threshold,
            } => Ok((approval_threshold, cancellation_threshold)),
            VotingPolicy::StakeWeighted => Err(TreasuryError::PolicyMismatch {
                required: EQUAL_WEIGHT,
            }),
        }
    }

    fn ensure_stake_weighted(&self) -> Result<()> {
        match self.policy {
            VotingPolicy::StakeWeighted => Ok(()),
            VotingPolicy::EqualWeight { .. } => Err(TreasuryError::PolicyMismatch {
                required: STAKE_WEIGHTED,
            }),
        }
    }

    /// Insert a member. Returns `false` if the identity was already a member.
    pub fn add_member(&mut self, identity: &str) -> bool {
        self.members.insert(identity.to_string())
    }

    /// Deposit a coin, returning the new balance
    pub fn deposit(&mut self, coin: Coin) -> Result<u64> {
        self.balance.deposit(coin)
    }

    /// Deposit a donation and count the collectible minted for it. Counters
    /// are only touched once the deposit has landed.
    pub fn record_donation(&mut self, coin: Coin) -> Result<u64> {
        let amount = coin.value();
        let balance = self.deposit(coin)?;
        self.donations_received = self.donations_received.saturating_add(amount);
        self.collectibles_minted += 1;
        Ok(balance)
    }

    /// Place an asset into custody with `holder` recorded as its holder
    pub fn deposit_asset(&mut self, holder: &str, asset: Asset) -> Result<()> {
        if self.assets.contains_key(&asset.id) {
            return Err(TreasuryError::DuplicateAsset(asset.id));
        }
        self.assets.insert(
            asset.id.clone(),
            HeldAsset {
                asset,
                holder: holder.to_string(),
                locked_by: None,
            },
        );
        Ok(())
    }

    /// Create an equal-weight transfer proposal with the creator's vote counted
    /// and thresholds evaluated immediately.
    pub fn propose(
        &mut self,
        creator: &str,
        action: ProposalAction,
        initial_decision: Decision,
        now: u64,
    ) -> Result<Transition> {
        self.thresholds()?;
        self.ensure_member(creator)?;

        match &action {
            ProposalAction::Transfer { amount, .. } => {
                if *amount == 0 {
                    return Err(TreasuryError::InvalidAmount(
                        "transfer amount must be positive".to_string(),
                    ));
                }
                let available = self.available_balance();
                if *amount > available {
                    return Err(TreasuryError::InsufficientBalance {
                        requested: *amount,
                        available,
                    });
                }
            }
            ProposalAction::AssetTransfer { asset_id, .. } => {
                let held = self
                    .assets
                    .get(asset_id)
                    .ok_or_else(|| TreasuryError::AssetNotFound(asset_id.clone()))?;
                if held.holder != creator {
                    return Err(TreasuryError::AssetOwnershipMismatch {
                        asset_id: asset_id.clone(),
                        holder: held.holder.clone(),
                        caller: creator.to_string(),
                    });
                }
                if held.locked_by.is_some() {
                    return Err(TreasuryError::AssetLocked(asset_id.clone()));
                }
            }
            ProposalAction::Motion { .. } => {
                return Err(TreasuryError::PolicyMismatch {
                    required: STAKE_WEIGHTED,
                });
            }
        }

        let id = self.next_proposal_id;
        let mut proposal = Proposal::new(id, creator.to_string(), action, now);
        proposal.record_vote(creator, initial_decision, MEMBER_VOTE_WEIGHT)?;

        let transition = self.commit(proposal, false, now)?;
        self.next_proposal_id += 1;
        Ok(transition)
    }

    /// Record an equal-weight vote and resolve the proposal if a threshold is
    /// crossed.
    pub fn cast(
        &mut self,
        id: ProposalId,
        voter: &str,
        decision: Decision,
        now: u64,
    ) -> Result<Transition> {
        self.thresholds()?;
        self.ensure_member(voter)?;

        let mut proposal = self.proposal(id)?.clone();
        proposal.record_vote(voter, decision, MEMBER_VOTE_WEIGHT)?;
        self.commit(proposal, true, now)
    }

    /// Evaluate thresholds on an updated proposal and store it. `reserved`
    /// says whether the proposal's amount or asset is already locked.
    ///
    /// The only fallible step (taking value out of custody) runs before any
    /// other mutation.
    fn commit(&mut self, mut proposal: Proposal, reserved: bool, now: u64) -> Result<Transition> {
        let (approval_threshold, cancellation_threshold) = self.thresholds()?;
        let resolution = evaluate_thresholds(
            proposal.approval_count,
            proposal.cancellation_count,
            self.members.len() as u64,
            approval_threshold,
            cancellation_threshold,
        );

        let release = match resolution {
            Some(Resolution::Execute) => Some(self.release(&proposal.action, reserved)?),
            Some(Resolution::Cancel) => {
                if reserved {
                    self.unreserve(&proposal.action);
                }
                None
            }
            None => {
                if !reserved {
                    self.reserve(&proposal.action, proposal.id);
                }
                None
            }
        };

        if let Some(resolution) = resolution {
            proposal.resolve(resolution.status(), now)?;
        }

        let transition = Transition {
            proposal_id: proposal.id,
            status: proposal.status,
            release,
        };
        self.proposals.insert(proposal.id, proposal);
        Ok(transition)
    }

    fn reserve(&mut self, action: &ProposalAction, id: ProposalId) {
        match action {
            ProposalAction::Transfer { amount, .. } => self.locked_balance += amount,
            ProposalAction::AssetTransfer { asset_id, .. } => {
                if let Some(held) = self.assets.get_mut(asset_id) {
                    held.locked_by = Some(id);
                }
            }
            ProposalAction::Motion { .. } => {}
        }
    }

    fn unreserve(&mut self, action: &ProposalAction) {
        match action {
            ProposalAction::Transfer { amount, .. } => {
                self.locked_balance = self.locked_balance.saturating_sub(*amount)
            }
            ProposalAction::AssetTransfer { asset_id, .. } => {
                if let Some(held) = self.assets.get_mut(asset_id) {
                    held.locked_by = None;
                }
            }
            ProposalAction::Motion { .. } => {}
        }
    }

    fn release(&mut self, action: &ProposalAction, reserved: bool) -> Result<Release> {
        let (recipient, payload) = match action {
            ProposalAction::Transfer { recipient, amount } => {
                let coin = self.balance.withdraw(*amount)?;
                (recipient.clone(), Payload::Coin(coin))
            }
            ProposalAction::AssetTransfer {
                recipient,
                asset_id,
            } => {
                let held = self
                    .assets
                    .remove(asset_id)
                    .ok_or_else(|| TreasuryError::AssetNotFound(asset_id.clone()))?;
                (recipient.clone(), Payload::Asset(held.asset))
            }
            ProposalAction::Motion { .. } => {
                return Err(TreasuryError::PolicyMismatch {
                    required: STAKE_WEIGHTED,
                })
            }
        };

        if reserved {
            if let ProposalAction::Transfer { amount, .. } = action {
                self.locked_balance = self.locked_balance.saturating_sub(*amount);
            }
        }

        Ok(Release { recipient, payload })
    }

    /// Open a stake-weighted motion whose voting window starts now
    pub fn propose_motion(
        &mut self,
        creator: &str,
        description: String,
        minimal_votes_required: u64,
        voting_end: u64,
        now: u64,
    ) -> Result<ProposalId> {
        self.ensure_stake_weighted()?;
        self.ensure_member(creator)?;

        let id = self.next_proposal_id;
        let proposal = Proposal::new(
            id,
            creator.to_string(),
            ProposalAction::Motion { description },
            now,
        )
        .with_window(VotingWindow {
            minimal_votes_required,
            voting_start: now,
            voting_end,
        });

        self.proposals.insert(id, proposal);
        self.next_proposal_id += 1;
        Ok(id)
    }

    /// Count a stake-weighted vote of `power` from `voter`
    pub fn stake_vote(
        &mut self,
        id: ProposalId,
        voter: &str,
        record_target: ProposalId,
        decision: Decision,
        power: u64,
        now: u64,
    ) -> Result<()> {
        self.ensure_stake_weighted()?;

        let proposal = self
            .proposals
            .get_mut(&id)
            .ok_or(TreasuryError::ProposalNotFound(id))?;
        proposal.ensure_stake_vote_allowed(voter, record_target, now)?;
        proposal.record_vote(voter, decision, power)
    }

    /// Mark a stake-weighted motion executed after its window closed
    pub fn execute_motion(&mut self, id: ProposalId, now: u64) -> Result<()> {
        self.ensure_stake_weighted()?;

        let proposal = self
            .proposals
            .get_mut(&id)
            .ok_or(TreasuryError::ProposalNotFound(id))?;
        proposal.ensure_executable(now)?;
        proposal.resolve(ProposalStatus::Executed, now)
    }

    /// Check the accounting invariants. Used when restoring a snapshot.
    pub fn verify_invariants(&self) -> Result<()> {
        let pending_sum = self
            .proposals
            .values()
            .filter(|p| p.is_pending())
            .try_fold(0u64, |sum, p| sum.checked_add(p.action.locked_amount()))
            .ok_or_else(|| {
                TreasuryError::InvariantViolation("pending amounts overflow".to_string())
            })?;

        if pending_sum != self.locked_balance {
            return Err(TreasuryError::InvariantViolation(format!(
                "locked balance {} does not match pending amounts {}",
                self.locked_balance, pending_sum
            )));
        }

        if self.locked_balance > self.balance() {
            return Err(TreasuryError::InvariantViolation(format!(
                "locked balance {} exceeds balance {}",
                self.locked_balance,
                self.balance()
            )));
        }

        if !self.members.contains(&self.owner) {
            return Err(TreasuryError::InvariantViolation(format!(
                "owner {} is not a member",
                self.owner
            )));
        }

        for (key, proposal) in &self.proposals {
            if proposal
                .approval_count
                .checked_add(proposal.cancellation_count)
                .is_none()
            {
                return Err(TreasuryError::InvariantViolation(format!(
                    "proposal {} tally overflows",
                    proposal.id
                )));
            }
            if *key != proposal.id || proposal.id >= self.next_proposal_id {
                return Err(TreasuryError::InvariantViolation(format!(
                    "proposal id {} is inconsistent",
                    proposal.id
                )));
            }
        }

        for held in self.assets.values() {
            let Some(id) = held.locked_by else { continue };
            let consistent = self.proposals.get(&id).is_some_and(|p| {
                p.is_pending()
                    && matches!(&p.action, ProposalAction::AssetTransfer { asset_id, .. } if *asset_id == held.asset.id)
            });
            if !consistent {
                return Err(TreasuryError::InvariantViolation(format!(
                    "asset {} is locked by proposal {} which does not reserve it",
                    held.asset.id, id
                )));
            }
        }

        Ok(())
    }
}
