//! Treasury CLI - operate a quorum treasury kept in a local state file

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use quorum_treasury::{
    Asset, Clock, Coin, Decision, Governance, ProposalAction, ProposalRequest, Services,
    SnapshotStore, SystemClock, TreasuryConfig,
};

#[derive(Parser)]
#[command(name = "treasury-cli")]
#[command(about = "Quorum treasury management CLI", version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", default_value = "treasury.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new treasury owned by OWNER
    Init {
        #[arg(short, long)]
        owner: String,
    },

    /// Donate value and receive a collectible
    Donate {
        #[arg(short, long)]
        from: String,

        #[arg(short, long)]
        amount: u64,
    },

    /// Add a member (owner only)
    AddMember {
        #[arg(short, long)]
        caller: String,

        #[arg(short, long)]
        member: String,
    },

    /// Place an asset into treasury custody
    DepositAsset {
        #[arg(short, long)]
        caller: String,

        #[arg(long)]
        id: String,

        #[arg(short, long)]
        name: String,
    },

    /// Propose a transfer of funds
    Propose {
        #[arg(short, long)]
        caller: String,

        #[arg(short, long)]
        recipient: String,

        #[arg(short, long)]
        amount: u64,

        /// Open with a rejecting vote instead of an approval
        #[arg(long)]
        reject: bool,
    },

    /// Propose a transfer of a custodied asset
    ProposeAsset {
        #[arg(short, long)]
        caller: String,

        #[arg(short, long)]
        recipient: String,

        #[arg(short, long)]
        asset: String,
    },

    /// Vote on an equal-weight proposal
    Vote {
        #[arg(short, long)]
        caller: String,

        #[arg(short, long)]
        id: u64,

        #[arg(long)]
        reject: bool,
    },

    /// Open a stake-weighted motion
    Motion {
        #[arg(short, long)]
        caller: String,

        #[arg(short, long)]
        description: String,

        /// Minimum combined vote weight
        #[arg(short, long)]
        min_votes: u64,

        /// Length of the voting window
        #[arg(long, default_value = "86400")]
        duration_secs: u64,
    },

    /// Cast a stake-weighted vote on a motion
    StakeVote {
        #[arg(short, long)]
        caller: String,

        #[arg(short, long)]
        id: u64,

        #[arg(short, long)]
        stake: u64,

        #[arg(long)]
        against: bool,
    },

    /// Execute a motion whose voting window has closed
    Execute {
        #[arg(short, long)]
        id: u64,
    },

    /// Show treasury summary
    Show,

    /// List all proposals
    List,
}

#[derive(Debug, Deserialize)]
struct Config {
    #[serde(flatten)]
    treasury: TreasuryConfig,

    #[serde(default)]
    storage: StorageConfig,
}

#[derive(Debug, Deserialize)]
struct StorageConfig {
    #[serde(default = "default_state_file")]
    state_file: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            state_file: default_state_file(),
        }
    }
}

fn default_state_file() -> PathBuf {
    PathBuf::from("treasury.json")
}

fn parse_config(contents: &str) -> Result<Config> {
    let config: Config = toml::from_str(contents).context("invalid configuration")?;
    config.treasury.validate()?;
    Ok(config)
}

fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        log::warn!("{} not found, using defaults", path.display());
        return parse_config("");
    }
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse_config(&contents)
}

fn open(config: &Config, store: &SnapshotStore) -> Result<Governance> {
    let treasury = store
        .load()?
        .with_context(|| format!("no treasury at {}, run `init` first", store.path().display()))?;
    Ok(Governance::restore(
        treasury,
        config.treasury.clone(),
        Services::default(),
    )?)
}

fn run(command: Commands, config: &Config) -> Result<()> {
    let store = SnapshotStore::new(&config.storage.state_file);

    if let Commands::Init { owner } = &command {
        if store.exists() {
            bail!("treasury already exists at {}", store.path().display());
        }
        let governance =
            Governance::create_wallet(owner, config.treasury.clone(), Services::default())?;
        store.save(&governance.snapshot())?;
        println!("\n🏦 Treasury created");
        println!("═══════════════════════════════════");
        println!("Wallet:  {}", governance.wallet_id());
        println!("Owner:   {}", owner);
        println!("Policy:  {}", config.treasury.policy.name());
        println!();
        return Ok(());
    }

    let governance = open(config, &store)?;

    match command {
        Commands::Init { .. } => unreachable!("handled above"),

        Commands::Donate { from, amount } => {
            let collectible = governance.donate(&from, Coin::new(amount))?;
            println!("🎁 {} donated {}; collectible {} minted", from, amount, collectible.id);
        }

        Commands::AddMember { caller, member } => {
            if governance.add_member(&caller, &member)? {
                println!("👥 {} added", member);
            } else {
                println!("👥 {} is already a member", member);
            }
        }

        Commands::DepositAsset { caller, id, name } => {
            governance.deposit_asset(&caller, Asset::new(id.clone(), name))?;
            println!("📦 Asset {} deposited by {}", id, caller);
        }

        Commands::Propose {
            caller,
            recipient,
            amount,
            reject,
        } => {
            let mut request = ProposalRequest::transfer(recipient, amount);
            if reject {
                request = request.with_initial_decision(Decision::Reject);
            }
            let id = governance.propose(&caller, request)?;
            let proposal = governance.proposal(id)?;
            println!("📝 Proposal {} created ({:?})", id, proposal.status);
        }

        Commands::ProposeAsset {
            caller,
            recipient,
            asset,
        } => {
            let id = governance.propose(&caller, ProposalRequest::asset_transfer(recipient, asset))?;
            let proposal = governance.proposal(id)?;
            println!("📝 Proposal {} created ({:?})", id, proposal.status);
        }

        Commands::Vote { caller, id, reject } => {
            let status = governance.cast(&caller, id, Decision::from_approve(!reject))?;
            println!("🗳️  Vote recorded; proposal {} is {:?}", id, status);
        }

        Commands::Motion {
            caller,
            description,
            min_votes,
            duration_secs,
        } => {
            let voting_end = SystemClock
                .now_ms()
                .saturating_add(duration_secs.saturating_mul(1_000));
            let id = governance.propose_motion(&caller, description, min_votes, voting_end)?;
            println!("📝 Motion {} open until {}", id, voting_end);
        }

        Commands::StakeVote {
            caller,
            id,
            stake,
            against,
        } => {
            let record = governance.cast_vote(id, Coin::new(stake), Decision::from_approve(!against));
            match governance.vote(&caller, id, record) {
                Ok(refund) => println!(
                    "🗳️  Vote recorded with power {}; {} returned to {}",
                    stake,
                    refund.value(),
                    caller
                ),
                Err(e) => {
                    let (error, record) = e.into_parts();
                    println!("↩️  Stake of {} returned", record.into_stake().value());
                    return Err(error.into());
                }
            }
        }

        Commands::Execute { id } => {
            governance.execute(id)?;
            println!("✅ Motion {} executed", id);
        }

        Commands::Show => {
            let stats = governance.stats();
            println!("\n🏦 Treasury {}", governance.wallet_id());
            println!("═══════════════════════════════════");
            println!("Balance:     {}", stats.balance);
            println!("Locked:      {}", stats.locked_balance);
            println!("Available:   {}", stats.available_balance);
            println!("Members:     {}", governance.members().join(", "));
            println!(
                "Proposals:   {} pending, {} executed, {} cancelled",
                stats.pending_proposals, stats.executed_proposals, stats.cancelled_proposals
            );
            println!("Assets:      {}", stats.assets_in_custody);
            println!(
                "Donations:   {} ({} collectibles)",
                stats.donations_received, stats.collectibles_minted
            );
            println!();
        }

        Commands::List => {
            let proposals = governance.proposals();
            println!("\n📋 Proposals ({})", proposals.len());
            println!("═══════════════════════════════════");
            for proposal in proposals {
                let what = match &proposal.action {
                    ProposalAction::Transfer { recipient, amount } => {
                        format!("transfer {} to {}", amount, recipient)
                    }
                    ProposalAction::AssetTransfer {
                        recipient,
                        asset_id,
                    } => format!("asset {} to {}", asset_id, recipient),
                    ProposalAction::Motion { description } => format!("motion: {}", description),
                };
                println!(
                    "  {}. [{:?}] {} (for {}, against {})",
                    proposal.id,
                    proposal.status,
                    what,
                    proposal.approval_count,
                    proposal.cancellation_count
                );
            }
            println!();
        }
    }

    store.save(&governance.snapshot())?;
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let config = load_config(&cli.config)?;
    run(cli.command, &config)
}
