//! Treasury configuration
//!
//! The voting policy and the donation collectible template are fixed when a
//! wallet is created and handed to the governance engine explicitly.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Result, TreasuryError};

/// Default approval threshold (percent of membership, strictly exceeded)
pub const DEFAULT_APPROVAL_THRESHOLD: u64 = 50;

/// Default cancellation threshold (percent of membership, strictly exceeded)
pub const DEFAULT_CANCELLATION_THRESHOLD: u64 = 50;

/// How votes are weighted and when a proposal resolves.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum VotingPolicy {
    /// One vote per member; proposals resolve as soon as a threshold is crossed.
    EqualWeight {
        approval_threshold: u64,
        cancellation_threshold: u64,
    },
    /// Voting power equals staked value; proposals resolve by explicit execution
    /// after their voting window closes.
    StakeWeighted,
}

impl VotingPolicy {
    pub fn name(&self) -> &'static str {
        match self {
            VotingPolicy::EqualWeight { .. } => EQUAL_WEIGHT,
            VotingPolicy::StakeWeighted => STAKE_WEIGHTED,
        }
    }
}

pub(crate) const EQUAL_WEIGHT: &str = "equal-weight";
pub(crate) const STAKE_WEIGHTED: &str = "stake-weighted";

impl Default for VotingPolicy {
    fn default() -> Self {
        VotingPolicy::EqualWeight {
            approval_threshold: DEFAULT_APPROVAL_THRESHOLD,
            cancellation_threshold: DEFAULT_CANCELLATION_THRESHOLD,
        }
    }
}

/// Fields copied verbatim onto every collectible minted for a donation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CollectibleTemplate {
    pub name: String,
    pub description: String,
    pub url: String,
}

impl Default for CollectibleTemplate {
    fn default() -> Self {
        Self {
            name: "Treasury Supporter".to_string(),
            description: "Minted as a thank-you for a treasury donation".to_string(),
            url: String::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TreasuryConfig {
    #[serde(default)]
    pub policy: VotingPolicy,
    #[serde(default)]
    pub collectible: CollectibleTemplate,
}

impl TreasuryConfig {
    pub fn equal_weight(approval_threshold: u64, cancellation_threshold: u64) -> Self {
        Self {
            policy: VotingPolicy::EqualWeight {
                approval_threshold,
                cancellation_threshold,
            },
            collectible: CollectibleTemplate::default(),
        }
    }

    pub fn stake_weighted() -> Self {
        Self {
            policy: VotingPolicy::StakeWeighted,
            collectible: CollectibleTemplate::default(),
        }
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: TreasuryConfig =
            toml::from_str(contents).map_err(|e| TreasuryError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            TreasuryError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn validate(&self) -> Result<()> {
        if let VotingPolicy::EqualWeight {
            approval_threshold,
            cancellation_threshold,
        } = self.policy
        {
            if approval_threshold > 100 {
                return Err(TreasuryError::Config(format!(
                    "approval_threshold must be at most 100, got {}",
                    approval_threshold
                )));
            }
            if cancellation_threshold > 100 {
                return Err(TreasuryError::Config(format!(
                    "cancellation_threshold must be at most 100, got {}",
                    cancellation_threshold
                )));
            }
        }

        if self.collectible.name.trim().is_empty() {
            return Err(TreasuryError::Config(
                "collectible name must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}
