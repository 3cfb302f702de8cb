// Collaborator contracts
//
// The core never talks to the network, decodes account bytes, derives addresses
// or submits transactions itself. It consumes those services through the traits
// below. Anything that reaches beyond process memory is async. Implementations
// are supplied by the caller (an RPC client, a program-specific decoder, an oracle
// adapter); tests use in-memory fakes.

use crate::config::ProgramIds;
use crate::instruction::Instruction;
use crate::market::LendingMarketState;
use crate::obligation::ObligationRecord;
use crate::reserve::ReserveState;
use crate::types::{Address, ErrorKind, Slot, Timestamp};
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Account kinds the decoder understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccountKind {
    LendingMarket,
    Reserve,
    Obligation,
}

#[derive(Debug, Clone)]
pub enum DecodedAccount {
    LendingMarket(LendingMarketState),
    Reserve(Box<ReserveState>),
    Obligation(Box<ObligationRecord>),
}

impl DecodedAccount {
    pub fn kind(&self) -> AccountKind {
        match self {
            DecodedAccount::LendingMarket(_) => AccountKind::LendingMarket,
            DecodedAccount::Reserve(_) => AccountKind::Reserve,
            DecodedAccount::Obligation(_) => AccountKind::Obligation,
        }
    }

    pub fn into_market(self) -> Result<LendingMarketState, DecodeError> {
        match self {
            DecodedAccount::LendingMarket(m) => Ok(m),
            other => Err(DecodeError::UnexpectedKind {
                expected: AccountKind::LendingMarket,
                found: other.kind(),
            }),
        }
    }

    pub fn into_reserve(self) -> Result<ReserveState, DecodeError> {
        match self {
            DecodedAccount::Reserve(r) => Ok(*r),
            other => Err(DecodeError::UnexpectedKind {
                expected: AccountKind::Reserve,
                found: other.kind(),
            }),
        }
    }

    pub fn into_obligation(self) -> Result<ObligationRecord, DecodeError> {
        match self {
            DecodedAccount::Obligation(o) => Ok(*o),
            other => Err(DecodeError::UnexpectedKind {
                expected: AccountKind::Obligation,
                found: other.kind(),
            }),
        }
    }
}

/// Byte buffer + kind -> typed record.
pub trait AccountDecoder: Send + Sync {
    fn decode(&self, kind: AccountKind, data: &[u8]) -> Result<DecodedAccount, DecodeError>;
}

/// Read access to ledger state.
#[async_trait]
pub trait LedgerReader: Send + Sync {
    async fn fetch_account(&self, address: &Address) -> Result<Option<Vec<u8>>, ChainError>;

    async fn fetch_accounts(&self, addresses: &[Address]) -> Result<Vec<Option<Vec<u8>>>, ChainError> {
        let mut out = Vec::with_capacity(addresses.len());
        for address in addresses {
            out.push(self.fetch_account(address).await?);
        }
        Ok(out)
    }

    async fn account_exists(&self, address: &Address) -> Result<bool, ChainError> {
        Ok(self.fetch_account(address).await?.is_some())
    }

    /// Every reserve registered under a market.
    async fn market_reserves(&self, market: &Address) -> Result<Vec<Address>, ChainError>;

    async fn current_slot(&self) -> Result<Slot, ChainError>;
}

// oracle contract

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PriceKind {
    Spot,
    Twap,
}

/// Where a reserve's price comes from. Absent on a reserve means no price can be resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleConfig {
    pub price_feed: Address,
    pub twap_feed: Option<Address>,
    pub max_age_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OraclePrice {
    pub price: Decimal,
    pub timestamp: Timestamp,
    pub is_stale: bool,
}

impl OraclePrice {
    pub fn fresh(price: Decimal, timestamp: Timestamp) -> Self {
        Self {
            price,
            timestamp,
            is_stale: false,
        }
    }
}

#[async_trait]
pub trait OracleAdapter: Send + Sync {
    async fn price(
        &self,
        mint: &Address,
        oracle: &OracleConfig,
        kind: PriceKind,
    ) -> Result<OraclePrice, OracleError>;
}

/// Deterministic sub-account addressing. Only `find_program_address` is required;
/// the helpers encode the ledger's seed layouts.
pub trait AddressDeriver: Send + Sync {
    fn find_program_address(&self, seeds: &[&[u8]], program_id: &Address) -> Address;

    fn user_metadata(&self, programs: &ProgramIds, owner: &Address) -> Address {
        self.find_program_address(&[b"user_meta", owner.as_ref()], &programs.lending)
    }

    fn referrer_token_state(&self, programs: &ProgramIds, referrer: &Address, reserve: &Address) -> Address {
        self.find_program_address(
            &[b"referrer_acc", referrer.as_ref(), reserve.as_ref()],
            &programs.lending,
        )
    }

    fn lending_market_authority(&self, programs: &ProgramIds, market: &Address) -> Address {
        self.find_program_address(&[b"lma", market.as_ref()], &programs.lending)
    }

    fn obligation_farm_state(&self, programs: &ProgramIds, farm: &Address, obligation: &Address) -> Address {
        self.find_program_address(&[b"user", farm.as_ref(), obligation.as_ref()], &programs.farms)
    }

    fn associated_token_account(
        &self,
        programs: &ProgramIds,
        owner: &Address,
        mint: &Address,
        token_program: &Address,
    ) -> Address {
        self.find_program_address(
            &[owner.as_ref(), token_program.as_ref(), mint.as_ref()],
            &programs.associated_token,
        )
    }

    fn obligation(
        &self,
        programs: &ProgramIds,
        tag: u8,
        id: u8,
        owner: &Address,
        market: &Address,
        seed1: &Address,
        seed2: &Address,
    ) -> Address {
        self.find_program_address(
            &[
                &[tag],
                &[id],
                owner.as_ref(),
                market.as_ref(),
                seed1.as_ref(),
                seed2.as_ref(),
            ],
            &programs.lending,
        )
    }
}

/// Opaque handle returned by the submission collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubmissionHandle(pub String);

/// Accepts an ordered instruction list. The core never waits for finality.
#[async_trait]
pub trait TransactionSubmitter: Send + Sync {
    async fn submit(
        &self,
        instructions: &[Instruction],
        signers: &[Address],
    ) -> Result<SubmissionHandle, SubmitError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChainError {
    #[error("Ledger request failed: {0}")]
    Request(String),

    #[error("Ledger request timed out")]
    Timeout,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("Account data is not a valid {0:?}")]
    NotDecodable(AccountKind),

    #[error("Expected {expected:?} account, decoded {found:?}")]
    UnexpectedKind { expected: AccountKind, found: AccountKind },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OracleError {
    #[error("No price available for mint {0}")]
    Unavailable(Address),

    #[error("Price feed {0} returned invalid data")]
    InvalidFeed(Address),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubmitError {
    #[error("Submission rejected: {0}")]
    Rejected(String),

    #[error("Submission transport failed: {0}")]
    Transport(String),
}

impl ChainError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::External
    }
}

impl DecodeError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::External
    }
}

impl OracleError {
    // an unavailable price means the routing for this asset is absent
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Configuration
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    struct HashDeriver;

    impl AddressDeriver for HashDeriver {
        fn find_program_address(&self, seeds: &[&[u8]], program_id: &Address) -> Address {
            let mut bytes = [0u8; 32];
            for (i, chunk) in bytes.chunks_mut(8).enumerate() {
                let mut h = DefaultHasher::new();
                i.hash(&mut h);
                program_id.hash(&mut h);
                for s in seeds {
                    s.hash(&mut h);
                }
                chunk.copy_from_slice(&h.finish().to_le_bytes());
            }
            Address::new(bytes)
        }
    }

    #[test]
    fn derived_addresses_are_deterministic_and_distinct() {
        let programs = ProgramIds::default();
        let owner = Address::new_unique();
        let a = HashDeriver.user_metadata(&programs, &owner);
        let b = HashDeriver.user_metadata(&programs, &owner);
        assert_eq!(a, b);

        let reserve = Address::new_unique();
        let referrer = HashDeriver.referrer_token_state(&programs, &owner, &reserve);
        assert_ne!(a, referrer);
    }

    #[test]
    fn decoded_account_kind_mismatch() {
        let decoded = DecodedAccount::LendingMarket(LendingMarketState::default());
        let err = decoded.into_reserve().unwrap_err();
        assert_eq!(
            err,
            DecodeError::UnexpectedKind {
                expected: AccountKind::Reserve,
                found: AccountKind::LendingMarket,
            }
        );
        assert_eq!(err.kind(), ErrorKind::External);
    }
}
