// 5.0 market.rs: market config, elevation groups and the shared reserve cache.
// obligations resolve their pools through it, the sequencer reads rates and caps
// from it. a refresh swaps a whole Arc<ReserveView>, never a field.

use crate::config::SequencerConfig;
use crate::integration::{
    AccountDecoder, AccountKind, ChainError, DecodeError, LedgerReader, OracleAdapter,
    OracleError, OraclePrice,
};
use crate::reserve::{ReserveError, ReserveState, ReserveView, MAX_MINT_DECIMALS};
use crate::types::{Address, ErrorKind, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, warn};

/// Alternate LTV / liquidation parameters shared by a set of correlated pools.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElevationGroup {
    pub id: u8,
    pub ltv_pct: u8,
    pub liquidation_threshold_pct: u8,
    pub max_liquidation_bonus_bps: u16,
    pub allow_new_loans: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LendingMarketState {
    pub owner: Address,
    pub quote_currency: String,
    pub referral_fee_bps: u16,
    pub elevation_groups: Vec<ElevationGroup>,
}

#[derive(Debug, Clone)]
pub struct MarketView {
    pub address: Address,
    pub state: LendingMarketState,
    reserves: HashMap<Address, Arc<ReserveView>>,
}

impl MarketView {
    pub fn new(address: Address, state: LendingMarketState) -> Self {
        Self {
            address,
            state,
            reserves: HashMap::new(),
        }
    }

    /// Adds or replaces a reserve. Returns the previous entry.
    pub fn insert_reserve(&mut self, reserve: ReserveView) -> Option<Arc<ReserveView>> {
        self.reserves.insert(reserve.address, Arc::new(reserve))
    }

    pub fn get_reserve(&self, address: &Address) -> Option<&Arc<ReserveView>> {
        self.reserves.get(address)
    }

    pub fn reserve(&self, address: &Address) -> Result<&Arc<ReserveView>, MarketError> {
        self.reserves
            .get(address)
            .ok_or(MarketError::ReserveNotFound(*address))
    }

    pub fn reserve_by_mint(&self, mint: &Address) -> Result<&Arc<ReserveView>, MarketError> {
        self.reserves
            .values()
            .find(|r| r.mint() == *mint)
            .ok_or(MarketError::MintNotFound(*mint))
    }

    pub fn reserve_by_symbol(&self, symbol: &str) -> Result<&Arc<ReserveView>, MarketError> {
        self.reserves
            .values()
            .find(|r| r.symbol() == symbol)
            .ok_or_else(|| MarketError::SymbolNotFound(symbol.to_string()))
    }

    pub fn reserves(&self) -> impl Iterator<Item = &Arc<ReserveView>> {
        self.reserves.values()
    }

    pub fn reserve_count(&self) -> usize {
        self.reserves.len()
    }

    pub fn elevation_group(&self, id: u8) -> Result<&ElevationGroup, MarketError> {
        self.state
            .elevation_groups
            .iter()
            .find(|g| g.id == id)
            .ok_or(MarketError::ElevationGroupNotFound(id))
    }

    /// Non-zero tiers supported by every reserve in the set. Empty input yields nothing.
    pub fn common_elevation_groups(&self, reserves: &[&ReserveView]) -> BTreeSet<u8> {
        let mut iter = reserves.iter();
        let mut common: BTreeSet<u8> = match iter.next() {
            Some(first) => first.elevation_groups().collect(),
            None => return BTreeSet::new(),
        };
        for reserve in iter {
            common.retain(|id| reserve.supports_elevation_group(*id));
        }
        common
    }

    /// Highest-LTV tier the set has in common and the market still opens to new loans.
    /// Ties go to the lower id.
    pub fn best_common_elevation_group(&self, reserves: &[&ReserveView]) -> Option<&ElevationGroup> {
        self.common_elevation_groups(reserves)
            .into_iter()
            .filter_map(|id| self.elevation_group(id).ok())
            .filter(|g| g.allow_new_loans)
            .fold(None, |best: Option<&ElevationGroup>, g| match best {
                Some(b) if b.ltv_pct >= g.ltv_pct => Some(b),
                _ => Some(g),
            })
    }

    /// Fetches the market record and every reserve under it, attaching oracle prices.
    pub async fn load(
        reader: &dyn LedgerReader,
        decoder: &dyn AccountDecoder,
        oracle: &dyn OracleAdapter,
        address: Address,
        config: &SequencerConfig,
    ) -> Result<Self, MarketError> {
        let data = reader
            .fetch_account(&address)
            .await?
            .ok_or(MarketError::MarketNotFound(address))?;
        let state = decoder.decode(AccountKind::LendingMarket, &data)?.into_market()?;
        let mut market = Self::new(address, state);

        let addresses = reader.market_reserves(&address).await?;
        let accounts = reader.fetch_accounts(&addresses).await?;
        for (reserve_address, data) in addresses.iter().zip(accounts) {
            let data = data.ok_or(MarketError::ReserveNotFound(*reserve_address))?;
            let state = decoder.decode(AccountKind::Reserve, &data)?.into_reserve()?;
            if state.lending_market != address {
                debug!(reserve = %reserve_address, "skipping reserve registered to another market");
                continue;
            }
            check_decimals(reserve_address, &state)?;
            let price = resolve_price(oracle, reserve_address, &state, config).await?;
            market.insert_reserve(ReserveView::new(*reserve_address, state, price));
        }
        Ok(market)
    }

    /// Re-reads one reserve and its price, replacing the cached entry wholesale.
    pub async fn refresh_reserve(
        &mut self,
        reader: &dyn LedgerReader,
        decoder: &dyn AccountDecoder,
        oracle: &dyn OracleAdapter,
        address: &Address,
        config: &SequencerConfig,
    ) -> Result<Arc<ReserveView>, MarketError> {
        let data = reader
            .fetch_account(address)
            .await?
            .ok_or(MarketError::ReserveNotFound(*address))?;
        let state = decoder.decode(AccountKind::Reserve, &data)?.into_reserve()?;
        check_decimals(address, &state)?;
        let price = resolve_price(oracle, address, &state, config).await?;
        let view = Arc::new(ReserveView::new(*address, state, price));
        self.reserves.insert(*address, Arc::clone(&view));
        Ok(view)
    }
}

fn check_decimals(reserve: &Address, state: &ReserveState) -> Result<(), MarketError> {
    let decimals = state.liquidity.mint_decimals;
    if decimals > MAX_MINT_DECIMALS {
        return Err(ReserveError::UnsupportedDecimals {
            reserve: *reserve,
            decimals,
        }
        .into());
    }
    Ok(())
}

// no oracle config: leave the price empty, reads of it fail later with a configuration error
async fn resolve_price(
    oracle: &dyn OracleAdapter,
    reserve: &Address,
    state: &ReserveState,
    config: &SequencerConfig,
) -> Result<Option<OraclePrice>, MarketError> {
    let oracle_config = match &state.config.oracle {
        Some(c) => c,
        None => return Ok(None),
    };
    let mut price = oracle
        .price(&state.liquidity.mint, oracle_config, config.price_kind)
        .await?;
    let max_age = oracle_config.max_age_secs.min(config.max_price_age_secs);
    if price.timestamp.elapsed_secs(&Timestamp::now()) > max_age {
        price.is_stale = true;
    }
    if price.is_stale {
        warn!(reserve = %reserve, symbol = %state.config.token_symbol, "oracle price is stale");
    }
    Ok(Some(price))
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MarketError {
    #[error("Lending market {0} not found")]
    MarketNotFound(Address),

    #[error("Reserve {0} not found")]
    ReserveNotFound(Address),

    #[error("No reserve for mint {0}")]
    MintNotFound(Address),

    #[error("No reserve with symbol {0}")]
    SymbolNotFound(String),

    #[error("Elevation group {0} is not configured on the market")]
    ElevationGroupNotFound(u8),

    #[error("Ledger error: {0}")]
    Chain(#[from] ChainError),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Oracle error: {0}")]
    Oracle(#[from] OracleError),

    #[error("Reserve error: {0}")]
    Reserve(#[from] ReserveError),
}

impl MarketError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            MarketError::MarketNotFound(_)
            | MarketError::ReserveNotFound(_)
            | MarketError::MintNotFound(_)
            | MarketError::SymbolNotFound(_) => ErrorKind::NotFound,
            MarketError::ElevationGroupNotFound(_) => ErrorKind::Configuration,
            MarketError::Chain(e) => e.kind(),
            MarketError::Decode(e) => e.kind(),
            MarketError::Oracle(e) => e.kind(),
            MarketError::Reserve(e) => e.kind(),
        }
    }
}
