// 8.0 config.rs: all sequencing settings in one place. program ids, limits, tuning.
// 8.1 ProgramIds carries the well-known token program addresses; the lending and
// farms programs must be supplied per deployment.

use crate::integration::PriceKind;
use crate::types::{Address, ErrorKind};
use serde::{Deserialize, Serialize};

pub const SYSTEM_PROGRAM_ID: Address = Address::new([0u8; 32]);

pub const TOKEN_PROGRAM_ID: Address = Address::new([
    6, 221, 246, 225, 215, 101, 161, 147, 217, 203, 225, 70, 206, 235, 121, 172, 28, 180, 133,
    237, 95, 91, 55, 145, 58, 140, 245, 133, 126, 255, 0, 169,
]);

pub const ASSOCIATED_TOKEN_PROGRAM_ID: Address = Address::new([
    140, 151, 37, 143, 78, 36, 137, 241, 187, 61, 16, 41, 20, 142, 13, 131, 11, 90, 19, 153, 218,
    255, 16, 132, 4, 142, 123, 216, 219, 233, 248, 89,
]);

pub const COMPUTE_BUDGET_PROGRAM_ID: Address = Address::new([
    3, 6, 70, 111, 229, 33, 23, 50, 255, 236, 173, 186, 114, 195, 155, 231, 188, 140, 229, 187,
    197, 247, 18, 107, 44, 67, 155, 58, 64, 0, 0, 0,
]);

// wrapped native asset mint
pub const NATIVE_MINT: Address = Address::new([
    6, 155, 136, 87, 254, 171, 129, 132, 251, 104, 127, 99, 70, 24, 192, 53, 218, 196, 57, 220,
    26, 235, 59, 85, 152, 160, 240, 0, 0, 0, 0, 1,
]);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramIds {
    pub lending: Address,
    pub farms: Address,
    pub token: Address,
    pub associated_token: Address,
    pub system: Address,
    pub compute_budget: Address,
    pub native_mint: Address,
}

impl ProgramIds {
    pub fn new(lending: Address, farms: Address) -> Self {
        Self {
            lending,
            farms,
            ..Self::default()
        }
    }
}

impl Default for ProgramIds {
    fn default() -> Self {
        Self {
            lending: Address::default(),
            farms: Address::default(),
            token: TOKEN_PROGRAM_ID,
            associated_token: ASSOCIATED_TOKEN_PROGRAM_ID,
            system: SYSTEM_PROGRAM_ID,
            compute_budget: COMPUTE_BUDGET_PROGRAM_ID,
            native_mint: NATIVE_MINT,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequencerConfig {
    pub programs: ProgramIds,
    // prepended to the lending transaction when set
    pub compute_unit_limit: Option<u32>,
    // ledger-side slot counts per obligation
    pub max_obligation_deposits: usize,
    pub max_obligation_borrows: usize,
    // once an obligation touches this many pools, bootstrap moves to a pre-transaction
    pub pre_transaction_reserve_threshold: usize,
    // reject deposits/borrows that would cross a reserve cap before the ledger does
    pub enforce_reserve_caps: bool,
    // after repaying all debt in a non-neutral tier, drop back to tier 0 in a post-transaction
    pub reset_elevation_group_after_full_repay: bool,
    pub price_kind: PriceKind,
    pub max_price_age_secs: u64,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            programs: ProgramIds::default(),
            compute_unit_limit: Some(1_000_000),
            max_obligation_deposits: 8,
            max_obligation_borrows: 5,
            pre_transaction_reserve_threshold: 5,
            enforce_reserve_caps: true,
            reset_elevation_group_after_full_repay: true,
            price_kind: PriceKind::Spot,
            max_price_age_secs: 120,
        }
    }
}

impl SequencerConfig {
    pub fn new(programs: ProgramIds) -> Self {
        Self {
            programs,
            ..Self::default()
        }
    }

    // local validator: no compute budget ix, caps left to the program
    pub fn localnet(programs: ProgramIds) -> Self {
        let mut config = Self::new(programs);
        config.compute_unit_limit = None;
        config.enforce_reserve_caps = false;
        config.max_price_age_secs = 3_600;
        config
    }

    pub fn devnet(programs: ProgramIds) -> Self {
        let mut config = Self::new(programs);
        config.max_price_age_secs = 600;
        config
    }

    // conservative: full compute budget, twap prices, tight staleness
    pub fn mainnet(programs: ProgramIds) -> Self {
        let mut config = Self::new(programs);
        config.compute_unit_limit = Some(1_400_000);
        config.price_kind = PriceKind::Twap;
        config.max_price_age_secs = 60;
        config
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.programs.lending.is_default() {
            return Err(ConfigError::MissingProgram { name: "lending" });
        }
        if self.programs.farms.is_default() {
            return Err(ConfigError::MissingProgram { name: "farms" });
        }
        if self.max_obligation_deposits == 0 || self.max_obligation_borrows == 0 {
            return Err(ConfigError::InvalidLimits {
                reason: "obligation slot counts must be positive".to_string(),
            });
        }
        if self.pre_transaction_reserve_threshold == 0 {
            return Err(ConfigError::InvalidLimits {
                reason: "pre-transaction threshold must be positive".to_string(),
            });
        }
        if let Some(units) = self.compute_unit_limit {
            if units == 0 || units > 1_400_000 {
                return Err(ConfigError::InvalidComputeBudget { units });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Program id for {name} is not set")]
    MissingProgram { name: &'static str },

    #[error("Invalid limits: {reason}")]
    InvalidLimits { reason: String },

    #[error("Compute unit limit {units} out of range")]
    InvalidComputeBudget { units: u32 },
}

impl ConfigError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Configuration
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    Localnet,
    Devnet,
    Mainnet,
}

impl Environment {
    pub fn config(&self, programs: ProgramIds) -> SequencerConfig {
        match self {
            Environment::Localnet => SequencerConfig::localnet(programs),
            Environment::Devnet => SequencerConfig::devnet(programs),
            Environment::Mainnet => SequencerConfig::mainnet(programs),
        }
    }
}
