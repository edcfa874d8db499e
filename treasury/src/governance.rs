//! Governance engine
//!
//! Wraps a [`Treasury`] behind a mutex so every call runs against the treasury
//! and its proposals exclusively, start to finish. Ledger transfers and
//! notifications are dispatched after the state change has been committed.

use parking_lot::Mutex;
use std::sync::Arc;
use uuid::Uuid;

use crate::clock::{Clock, SystemClock};
use crate::config::TreasuryConfig;
use crate::error::{Result, TreasuryError};
use crate::events::{EventSink, LogEventSink, TreasuryEvent};
use crate::ledger::{Asset, Coin, Collectible, LoggingPayout, MembershipBadge, Payload, Payout};
use crate::proposal::{
    Decision, Proposal, ProposalAction, ProposalId, ProposalStatus, VotingResults,
};
use crate::treasury::{Transition, Treasury, TreasuryStats, MEMBER_VOTE_WEIGHT};
use crate::vote_record::{VoteError, VoteRecord};

/// Collaborators supplied by the host
#[derive(Clone)]
pub struct Services {
    pub clock: Arc<dyn Clock>,
    pub payout: Arc<dyn Payout>,
    pub events: Arc<dyn EventSink>,
}

impl Services {
    pub fn new(clock: Arc<dyn Clock>, payout: Arc<dyn Payout>, events: Arc<dyn EventSink>) -> Self {
        Self {
            clock,
            payout,
            events,
        }
    }
}

impl Default for Services {
    /// Wall clock, logged transfers, logged events
    fn default() -> Self {
        Self::new(
            Arc::new(SystemClock),
            Arc::new(LoggingPayout),
            Arc::new(LogEventSink),
        )
    }
}

/// A transfer or asset proposal request under the equal-weight policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProposalRequest {
    pub action: ProposalAction,
    pub initial_decision: Decision,
}

impl ProposalRequest {
    pub fn transfer(recipient: impl Into<String>, amount: u64) -> Self {
        Self {
            action: ProposalAction::Transfer {
                recipient: recipient.into(),
                amount,
            },
            initial_decision: Decision::Approve,
        }
    }

    pub fn asset_transfer(recipient: impl Into<String>, asset_id: impl Into<String>) -> Self {
        Self {
            action: ProposalAction::AssetTransfer {
                recipient: recipient.into(),
                asset_id: asset_id.into(),
            },
            initial_decision: Decision::Approve,
        }
    }

    /// Record the creator's vote as `decision` instead of an approval
    pub fn with_initial_decision(mut self, decision: Decision) -> Self {
        self.initial_decision = decision;
        self
    }
}

pub struct Governance {
    config: TreasuryConfig,
    treasury: Mutex<Treasury>,
    services: Services,
}

impl Governance {
    /// Create a wallet owned by `owner`, who becomes its only member and
    /// receives a membership badge.
    pub fn create_wallet(owner: &str, config: TreasuryConfig, services: Services) -> Result<Self> {
        config.validate()?;

        let wallet_id = Uuid::new_v4().to_string();
        let now = services.clock.now_ms();
        let treasury = Treasury::new(wallet_id.clone(), owner.to_string(), config.policy, now);

        log::info!(
            "🏦 Created treasury {} for {} ({} policy)",
            wallet_id,
            owner,
            config.policy.name()
        );

        let governance = Self {
            config,
            treasury: Mutex::new(treasury),
            services,
        };
        governance.issue_badge(&wallet_id, owner);
        Ok(governance)
    }

    /// Resume governance over a previously persisted treasury
    pub fn restore(treasury: Treasury, config: TreasuryConfig, services: Services) -> Result<Self> {
        config.validate()?;
        if treasury.policy() != config.policy {
            return Err(TreasuryError::Config(format!(
                "treasury {} uses the {} policy, configuration says {}",
                treasury.wallet_id(),
                treasury.policy().name(),
                config.policy.name()
            )));
        }
        treasury.verify_invariants()?;

        Ok(Self {
            config,
            treasury: Mutex::new(treasury),
            services,
        })
    }

    pub fn config(&self) -> &TreasuryConfig {
        &self.config
    }

    /// Copy of the current treasury state
    pub fn snapshot(&self) -> Treasury {
        self.treasury.lock().clone()
    }

    pub fn wallet_id(&self) -> String {
        self.treasury.lock().wallet_id().to_string()
    }

    pub fn is_member(&self, identity: &str) -> bool {
        self.treasury.lock().is_member(identity)
    }

    pub fn members(&self) -> Vec<String> {
        self.treasury.lock().members().cloned().collect()
    }

    pub fn balance(&self) -> u64 {
        self.treasury.lock().balance()
    }

    pub fn locked_balance(&self) -> u64 {
        self.treasury.lock().locked_balance()
    }

    pub fn proposal(&self, id: ProposalId) -> Result<Proposal> {
        self.treasury.lock().proposal(id).cloned()
    }

    pub fn proposal_at(&self, index: usize) -> Result<Proposal> {
        self.treasury.lock().proposal_at(index).cloned()
    }

    pub fn proposals(&self) -> Vec<Proposal> {
        self.treasury
            .lock()
            .proposals()
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn proposals_by_status(&self, status: ProposalStatus) -> Vec<Proposal> {
        self.treasury
            .lock()
            .proposals_by_status(status)
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn voting_results(&self, id: ProposalId) -> Result<VotingResults> {
        self.treasury.lock().voting_results(id)
    }

    pub fn stats(&self) -> TreasuryStats {
        self.treasury.lock().stats()
    }

    /// Owner-only. Returns `false` when `member` already belonged to the
    /// treasury; no second badge is issued in that case.
    pub fn add_member(&self, caller: &str, member: &str) -> Result<bool> {
        let (wallet_id, inserted) = {
            let mut treasury = self.treasury.lock();
            treasury.ensure_owner(caller)?;
            let inserted = treasury.add_member(member);
            (treasury.wallet_id().to_string(), inserted)
        };

        if inserted {
            log::info!("👥 Added member {} to treasury {}", member, wallet_id);
            self.issue_badge(&wallet_id, member);
            self.services.events.emit(&TreasuryEvent::MemberAdded {
                wallet_id,
                member: member.to_string(),
            });
        } else {
            log::debug!("{} is already a member of {}", member, wallet_id);
        }
        Ok(inserted)
    }

    /// Deposit a donation and send the donor one collectible minted from the
    /// configured template. Returns the collectible.
    pub fn donate(&self, donor: &str, coin: Coin) -> Result<Collectible> {
        let amount = coin.value();
        if amount == 0 {
            return Err(TreasuryError::InvalidAmount(
                "donation must be positive".to_string(),
            ));
        }

        let template = &self.config.collectible;
        let collectible = Collectible {
            id: Uuid::new_v4().to_string(),
            name: template.name.clone(),
            description: template.description.clone(),
            url: template.url.clone(),
        };

        let (wallet_id, balance) = {
            let mut treasury = self.treasury.lock();
            let balance = treasury.record_donation(coin)?;
            (treasury.wallet_id().to_string(), balance)
        };

        log::info!(
            "🎁 Donation of {} from {} to treasury {} (balance {})",
            amount,
            donor,
            wallet_id,
            balance
        );
        self.services
            .payout
            .transfer(donor, Payload::Collectible(collectible.clone()));
        self.services.events.emit(&TreasuryEvent::CollectibleMinted {
            wallet_id,
            collectible_id: collectible.id.clone(),
            donor: donor.to_string(),
            amount,
        });
        Ok(collectible)
    }

    /// Place an asset into custody, recording `caller` as its holder
    pub fn deposit_asset(&self, caller: &str, asset: Asset) -> Result<()> {
        let asset_id = asset.id.clone();
        self.treasury.lock().deposit_asset(caller, asset)?;
        log::info!("📦 {} deposited asset {}", caller, asset_id);
        Ok(())
    }

    /// Create a transfer or asset proposal. The creator's vote is counted and
    /// thresholds are evaluated before returning, so a proposal may already be
    /// resolved when this returns.
    pub fn propose(&self, caller: &str, request: ProposalRequest) -> Result<ProposalId> {
        let now = self.services.clock.now_ms();
        let (wallet_id, transition) = {
            let mut treasury = self.treasury.lock();
            let transition =
                treasury.propose(caller, request.action, request.initial_decision, now)?;
            (treasury.wallet_id().to_string(), transition)
        };

        let proposal_id = transition.proposal_id;
        log::info!("📝 {} created proposal {}", caller, proposal_id);
        self.services.events.emit(&TreasuryEvent::ProposalCreated {
            wallet_id: wallet_id.clone(),
            proposal_id,
            creator: caller.to_string(),
        });
        self.services.events.emit(&TreasuryEvent::VoteCast {
            wallet_id: wallet_id.clone(),
            proposal_id,
            voter: caller.to_string(),
            decision: request.initial_decision,
            weight: MEMBER_VOTE_WEIGHT,
        });
        self.dispatch(&wallet_id, transition);
        Ok(proposal_id)
    }

    /// Cast an equal-weight vote. Returns the proposal status after threshold
    /// evaluation.
    pub fn cast(&self, caller: &str, id: ProposalId, decision: Decision) -> Result<ProposalStatus> {
        let now = self.services.clock.now_ms();
        let (wallet_id, transition) = {
            let mut treasury = self.treasury.lock();
            let transition = treasury.cast(id, caller, decision, now)?;
            (treasury.wallet_id().to_string(), transition)
        };

        log::debug!("🗳️ {} voted {:?} on proposal {}", caller, decision, id);
        self.services.events.emit(&TreasuryEvent::VoteCast {
            wallet_id: wallet_id.clone(),
            proposal_id: id,
            voter: caller.to_string(),
            decision,
            weight: MEMBER_VOTE_WEIGHT,
        });

        let status = transition.status;
        self.dispatch(&wallet_id, transition);
        Ok(status)
    }

    /// Open a stake-weighted motion. Voting starts now and runs until
    /// `voting_end`; the ordering of the two is not checked here.
    pub fn propose_motion(
        &self,
        caller: &str,
        description: impl Into<String>,
        minimal_votes_required: u64,
        voting_end: u64,
    ) -> Result<ProposalId> {
        let now = self.services.clock.now_ms();
        let (wallet_id, id) = {
            let mut treasury = self.treasury.lock();
            let id = treasury.propose_motion(
                caller,
                description.into(),
                minimal_votes_required,
                voting_end,
                now,
            )?;
            (treasury.wallet_id().to_string(), id)
        };

        if voting_end <= now {
            log::warn!(
                "Motion {} has a voting window that never opens (start {}, end {})",
                id,
                now,
                voting_end
            );
        }
        log::info!("📝 {} opened motion {}", caller, id);
        self.services.events.emit(&TreasuryEvent::ProposalCreated {
            wallet_id,
            proposal_id: id,
            creator: caller.to_string(),
        });
        Ok(id)
    }

    /// Wrap a stake into a vote record for proposal `id`. The proposal is not
    /// touched.
    pub fn cast_vote(&self, id: ProposalId, stake: Coin, decision: Decision) -> VoteRecord {
        VoteRecord::new(id, stake, decision)
    }

    /// Consume a vote record against proposal `id` and return its stake. On
    /// failure the record is handed back inside the error.
    pub fn vote(
        &self,
        caller: &str,
        id: ProposalId,
        record: VoteRecord,
    ) -> std::result::Result<Coin, VoteError> {
        let now = self.services.clock.now_ms();
        let power = record.voting_power();
        let decision = record.decision();

        let result = {
            let mut treasury = self.treasury.lock();
            treasury
                .stake_vote(id, caller, record.proposal_id(), decision, power, now)
                .map(|_| treasury.wallet_id().to_string())
        };

        match result {
            Ok(wallet_id) => {
                log::debug!(
                    "🗳️ {} voted {:?} on motion {} with power {}",
                    caller,
                    decision,
                    id,
                    power
                );
                self.services.events.emit(&TreasuryEvent::VoteCast {
                    wallet_id,
                    proposal_id: id,
                    voter: caller.to_string(),
                    decision,
                    weight: power,
                });
                Ok(record.into_stake())
            }
            Err(error) => Err(VoteError::new(error, record)),
        }
    }

    /// Execute a stake-weighted motion once its window has closed with enough
    /// combined votes.
    pub fn execute(&self, id: ProposalId) -> Result<()> {
        let now = self.services.clock.now_ms();
        let wallet_id = {
            let mut treasury = self.treasury.lock();
            treasury.execute_motion(id, now)?;
            treasury.wallet_id().to_string()
        };

        log::info!("✅ Motion {} executed", id);
        self.services
            .events
            .emit(&TreasuryEvent::ProposalExecuted {
                wallet_id,
                proposal_id: id,
            });
        Ok(())
    }

    fn dispatch(&self, wallet_id: &str, transition: Transition) {
        let proposal_id = transition.proposal_id;
        match transition.status {
            ProposalStatus::Pending => {}
            ProposalStatus::Executed => {
                log::info!("✅ Proposal {} executed", proposal_id);
                if let Some(release) = transition.release {
                    self.services
                        .payout
                        .transfer(&release.recipient, release.payload);
                }
                self.services.events.emit(&TreasuryEvent::ProposalExecuted {
                    wallet_id: wallet_id.to_string(),
                    proposal_id,
                });
            }
            ProposalStatus::Cancelled => {
                log::info!("❌ Proposal {} cancelled", proposal_id);
                self.services.events.emit(&TreasuryEvent::ProposalCancelled {
                    wallet_id: wallet_id.to_string(),
                    proposal_id,
                });
            }
        }
    }

    fn issue_badge(&self, wallet_id: &str, member: &str) {
        self.services.payout.transfer(
            member,
            Payload::Badge(MembershipBadge {
                wallet_id: wallet_id.to_string(),
                member: member.to_string(),
            }),
        );
    }
}
