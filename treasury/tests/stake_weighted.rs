//! Stake-weighted, time-boxed motions

use quorum_treasury::*;
use std::sync::Arc;

const START: u64 = 1_700_000_000_000;
const HOUR: u64 = 3_600_000;

struct World {
    governance: Governance,
    clock: Arc<ManualClock>,
    events: Arc<EventLog>,
}

fn world() -> World {
    let clock = Arc::new(ManualClock::new(START));
    let events = Arc::new(EventLog::new());
    let services = Services::new(clock.clone(), Arc::new(InMemoryLedger::new()), events.clone());
    let governance =
        Governance::create_wallet("alice", TreasuryConfig::stake_weighted(), services).unwrap();
    World {
        governance,
        clock,
        events,
    }
}

fn stake_vote(w: &World, voter: &str, id: ProposalId, stake: u64, decision: Decision) -> Coin {
    let record = w.governance.cast_vote(id, Coin::new(stake), decision);
    w.governance
        .vote(voter, id, record)
        .unwrap_or_else(|e| panic!("vote by {} failed: {}", voter, e))
}

#[test]
fn test_quorum_reached_after_window() {
    let w = world();
    let id = w
        .governance
        .propose_motion("alice", "Renew the hosting contract", 100, START + HOUR)
        .unwrap();

    let window = w.governance.proposal(id).unwrap().window.unwrap();
    assert_eq!(window.voting_start, START);
    assert_eq!(window.voting_end, START + HOUR);

    w.clock.advance(10 * 60_000);
    let refund = stake_vote(&w, "bob", id, 60, Decision::Approve);
    assert_eq!(refund.value(), 60);
    let refund = stake_vote(&w, "carol", id, 50, Decision::Reject);
    assert_eq!(refund.value(), 50);

    let proposal = w.governance.proposal(id).unwrap();
    assert_eq!(proposal.approval_count, 60);
    assert_eq!(proposal.cancellation_count, 50);

    // still inside the window
    assert_eq!(
        w.governance.execute(id),
        Err(TreasuryError::VotingNotEnded {
            now: START + 10 * 60_000,
            voting_end: START + HOUR
        })
    );

    w.clock.set(START + HOUR + 1);
    w.governance.execute(id).unwrap();
    assert_eq!(
        w.governance.proposal(id).unwrap().status,
        ProposalStatus::Executed
    );
    assert!(w.events.events().contains(&TreasuryEvent::ProposalExecuted {
        wallet_id: w.governance.wallet_id(),
        proposal_id: id,
    }));
}

#[test]
fn test_execute_requires_minimum_votes() {
    let w = world();
    let id = w
        .governance
        .propose_motion("alice", "Change the logo", 100, START + HOUR)
        .unwrap();
    stake_vote(&w, "bob", id, 99, Decision::Approve);

    w.clock.set(START + 2 * HOUR);
    assert_eq!(
        w.governance.execute(id),
        Err(TreasuryError::InsufficientVotes {
            cast: 99,
            required: 100
        })
    );
    assert!(w.governance.proposal(id).unwrap().is_pending());
}

#[test]
fn test_execute_at_exact_end_is_too_early() {
    let w = world();
    let id = w
        .governance
        .propose_motion("alice", "Quarterly report", 0, START + HOUR)
        .unwrap();

    w.clock.set(START + HOUR);
    assert!(matches!(
        w.governance.execute(id),
        Err(TreasuryError::VotingNotEnded { .. })
    ));

    // and votes are no longer accepted at that instant either
    let record = w.governance.cast_vote(id, Coin::new(5), Decision::Approve);
    let err = w.governance.vote("bob", id, record).unwrap_err();
    assert!(matches!(err.error, TreasuryError::VotingEnded { .. }));
}

#[test]
fn test_double_execution_rejected() {
    let w = world();
    let id = w
        .governance
        .propose_motion("alice", "Archive the forum", 10, START + HOUR)
        .unwrap();
    stake_vote(&w, "bob", id, 10, Decision::Approve);

    w.clock.set(START + HOUR + 1);
    w.governance.execute(id).unwrap();
    assert_eq!(
        w.governance.execute(id),
        Err(TreasuryError::AlreadyExecuted(id))
    );
}

#[test]
fn test_duplicate_stake_vote_rejected() {
    let w = world();
    let id = w
        .governance
        .propose_motion("alice", "Hire an auditor", 10, START + HOUR)
        .unwrap();
    stake_vote(&w, "bob", id, 40, Decision::Approve);

    let record = w.governance.cast_vote(id, Coin::new(25), Decision::Reject);
    let err = w.governance.vote("bob", id, record).unwrap_err();
    assert_eq!(
        err.error,
        TreasuryError::DuplicateVote {
            proposal_id: id,
            voter: "bob".to_string()
        }
    );
    assert_eq!(err.record.voting_power(), 25);

    let proposal = w.governance.proposal(id).unwrap();
    assert_eq!(proposal.approval_count, 40);
    assert_eq!(proposal.cancellation_count, 0);
}

#[test]
fn test_record_for_other_proposal_rejected() {
    let w = world();
    let first = w
        .governance
        .propose_motion("alice", "First", 10, START + HOUR)
        .unwrap();
    let second = w
        .governance
        .propose_motion("alice", "Second", 10, START + HOUR)
        .unwrap();

    let record = w.governance.cast_vote(first, Coin::new(10), Decision::Approve);
    let err = w.governance.vote("bob", second, record).unwrap_err();
    assert_eq!(
        err.error,
        TreasuryError::ProposalMismatch {
            proposal: second,
            record: first
        }
    );

    // the returned record still works where it belongs
    let refund = w.governance.vote("bob", first, err.record).unwrap();
    assert_eq!(refund.value(), 10);
}

#[test]
fn test_malformed_window_is_kept() {
    let w = world();
    // voting_end before voting_start is accepted at creation
    let id = w
        .governance
        .propose_motion("alice", "Backdated", 0, START - 1)
        .unwrap();

    let record = w.governance.cast_vote(id, Coin::new(1), Decision::Approve);
    let err = w.governance.vote("bob", id, record).unwrap_err();
    assert!(matches!(err.error, TreasuryError::VotingEnded { .. }));

    // with no votes required it can still be executed
    w.governance.execute(id).unwrap();
}

#[test]
fn test_motion_requires_member_creator() {
    let w = world();
    assert_eq!(
        w.governance
            .propose_motion("mallory", "Drain everything", 1, START + HOUR),
        Err(TreasuryError::NotAMember("mallory".to_string()))
    );
}

#[test]
fn test_equal_weight_operations_refused() {
    let w = world();
    w.governance.donate("dora", Coin::new(10)).unwrap();

    assert_eq!(
        w.governance
            .propose("alice", ProposalRequest::transfer("bob", 5)),
        Err(TreasuryError::PolicyMismatch {
            required: "equal-weight"
        })
    );

    let id = w
        .governance
        .propose_motion("alice", "Motion", 1, START + HOUR)
        .unwrap();
    assert_eq!(
        w.governance.cast("alice", id, Decision::Approve),
        Err(TreasuryError::PolicyMismatch {
            required: "equal-weight"
        })
    );
}

#[test]
fn test_results_report_weights() {
    let w = world();
    let id = w
        .governance
        .propose_motion("alice", "Budget", 1, START + HOUR)
        .unwrap();
    stake_vote(&w, "bob", id, 300, Decision::Approve);
    stake_vote(&w, "carol", id, 100, Decision::Reject);

    let results = w.governance.voting_results(id).unwrap();
    assert_eq!(results.total_votes, 400);
    assert_eq!(results.voter_count, 2);
    assert_eq!(results.approval_percentage(), 75);
    assert_eq!(results.participation_rate(), 0);
}

#[test]
fn test_results_with_huge_stake() {
    let w = world();
    let id = w
        .governance
        .propose_motion("alice", "Endowment", 1, START + HOUR)
        .unwrap();
    stake_vote(&w, "whale", id, u64::MAX / 50, Decision::Approve);

    let results = w.governance.voting_results(id).unwrap();
    assert_eq!(results.approval_percentage(), 100);

    // a stake that would overflow the tally is refused and handed back
    let record = w.governance.cast_vote(id, Coin::new(u64::MAX), Decision::Reject);
    let err = w.governance.vote("shark", id, record).unwrap_err();
    assert!(matches!(err.error, TreasuryError::AmountOverflow { .. }));
    assert_eq!(err.record.voting_power(), u64::MAX);
    assert_eq!(w.governance.proposal(id).unwrap().cancellation_count, 0);
}
