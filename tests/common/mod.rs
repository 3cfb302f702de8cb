//! In-memory collaborators and market builders shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use lend_core::*;
use rust_decimal::Decimal;
use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

pub const SLOT: Slot = 1_000;

/// Ledger + decoder in one. Account bytes are the address itself, the decoder maps
/// them back to the stored record.
#[derive(Default)]
pub struct MockLedger {
    pub accounts: HashMap<Address, Vec<u8>>,
    pub records: HashMap<Vec<u8>, DecodedAccount>,
    pub market_reserves: HashMap<Address, Vec<Address>>,
    pub failing: HashSet<Address>,
    pub slot: Slot,
    pub lookups: AtomicUsize,
}

impl MockLedger {
    pub fn new() -> Self {
        Self {
            slot: SLOT,
            ..Default::default()
        }
    }

    /// Account that exists but carries no decodable record (token accounts, metadata).
    pub fn touch(&mut self, address: Address) {
        self.accounts.insert(address, vec![1]);
    }

    pub fn put(&mut self, address: Address, record: DecodedAccount) {
        let data = address.to_bytes().to_vec();
        self.accounts.insert(address, data.clone());
        self.records.insert(data, record);
    }

    pub fn fail(&mut self, address: Address) {
        self.failing.insert(address);
    }
}

#[async_trait]
impl LedgerReader for MockLedger {
    async fn fetch_account(&self, address: &Address) -> Result<Option<Vec<u8>>, ChainError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(address) {
            return Err(ChainError::Request(format!("connection reset fetching {}", address)));
        }
        Ok(self.accounts.get(address).cloned())
    }

    async fn market_reserves(&self, market: &Address) -> Result<Vec<Address>, ChainError> {
        Ok(self.market_reserves.get(market).cloned().unwrap_or_default())
    }

    async fn current_slot(&self) -> Result<Slot, ChainError> {
        Ok(self.slot)
    }
}

impl AccountDecoder for MockLedger {
    fn decode(&self, kind: AccountKind, data: &[u8]) -> Result<DecodedAccount, DecodeError> {
        self.records
            .get(data)
            .cloned()
            .ok_or(DecodeError::NotDecodable(kind))
    }
}

/// Stable pseudo-derivation: distinct seeds give distinct addresses.
pub struct HashDeriver;

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

#[derive(Default)]
pub struct MockOracle {
    pub prices: HashMap<Address, OraclePrice>,
}

#[async_trait]
impl OracleAdapter for MockOracle {
    async fn price(&self, mint: &Address, _oracle: &OracleConfig, _kind: PriceKind) -> Result<OraclePrice, OracleError> {
        self.prices.get(mint).copied().ok_or(OracleError::Unavailable(*mint))
    }
}

/// Records bundle sizes; rejects once `fail_at` bundles went through.
#[derive(Default)]
pub struct MockSubmitter {
    pub submitted: Mutex<Vec<usize>>,
    pub fail_at: Option<usize>,
}

#[async_trait]
impl TransactionSubmitter for MockSubmitter {
    async fn submit(&self, instructions: &[Instruction], _signers: &[Address]) -> Result<SubmissionHandle, SubmitError> {
        let mut submitted = self
            .submitted
            .lock()
            .map_err(|_| SubmitError::Transport("poisoned".to_string()))?;
        if Some(submitted.len()) == self.fail_at {
            return Err(SubmitError::Rejected("blockhash expired".to_string()));
        }
        submitted.push(instructions.len());
        Ok(SubmissionHandle(format!("tx-{}", submitted.len())))
    }
}

pub fn programs() -> ProgramIds {
    ProgramIds::new(Address::new_unique(), Address::new_unique())
}

/// Reserve with one million whole tokens available (saturating), nothing borrowed.
pub fn reserve_state(symbol: &str, ltv: u8, liq_threshold: u8, decimals: u8, mint: Address) -> ReserveState {
    let available = 10u64
        .checked_pow(decimals as u32)
        .map_or(u64::MAX, |factor| factor.saturating_mul(1_000_000));
    ReserveState {
        last_update_slot: SLOT,
        liquidity: ReserveLiquidity {
            mint,
            mint_decimals: decimals,
            supply_vault: Address::new_unique(),
            fee_vault: Address::new_unique(),
            token_program: TOKEN_PROGRAM_ID,
            available_amount: available,
            cumulative_borrow_rate_bsf: Fraction::ONE.to_bits(),
            ..Default::default()
        },
        collateral: ReserveCollateral {
            mint: Address::new_unique(),
            mint_total_supply: available,
            supply_vault: Address::new_unique(),
        },
        config: ReserveConfig {
            token_symbol: symbol.to_string(),
            loan_to_value_pct: ltv,
            liquidation_threshold_pct: liq_threshold,
            min_liquidation_bonus_bps: 200,
            max_liquidation_bonus_bps: 1_000,
            borrow_factor_pct: 100,
            protocol_take_rate_pct: 10,
            deposit_limit: u64::MAX / 2,
            borrow_limit: u64::MAX / 2,
            elevation_groups: vec![],
            borrow_rate_curve: BorrowRateCurve::from_bps(&[(0, 0), (8_000, 800), (10_000, 5_000)])
                .unwrap_or_default(),
            oracle: Some(OracleConfig {
                price_feed: Address::new_unique(),
                twap_feed: None,
                max_age_secs: 60,
            }),
        },
        ..Default::default()
    }
}

pub fn reserve(symbol: &str, ltv: u8, liq_threshold: u8, price: u64, decimals: u8) -> ReserveView {
    reserve_with_mint(symbol, ltv, liq_threshold, price, decimals, Address::new_unique())
}

pub fn reserve_with_mint(symbol: &str, ltv: u8, liq_threshold: u8, price: u64, decimals: u8, mint: Address) -> ReserveView {
    ReserveView::new(
        Address::new_unique(),
        reserve_state(symbol, ltv, liq_threshold, decimals, mint),
        Some(OraclePrice::fresh(Decimal::from(price), Timestamp::now())),
    )
}

pub fn elevation_group(id: u8, ltv: u8, liq_threshold: u8) -> ElevationGroup {
    ElevationGroup {
        id,
        ltv_pct: ltv,
        liquidation_threshold_pct: liq_threshold,
        max_liquidation_bonus_bps: 200,
        allow_new_loans: true,
    }
}

pub fn market(reserves: Vec<ReserveView>, groups: Vec<ElevationGroup>) -> MarketView {
    let address = Address::new_unique();
    let mut market = MarketView::new(
        address,
        LendingMarketState {
            owner: Address::new_unique(),
            quote_currency: "USD".to_string(),
            referral_fee_bps: 0,
            elevation_groups: groups,
        },
    );
    for mut reserve in reserves {
        reserve.state.lending_market = address;
        market.insert_reserve(reserve);
    }
    market
}

/// Obligation record with the given positions, in slot order. Amounts in base units.
pub fn obligation_record(
    market: &MarketView,
    owner: Address,
    deposits: &[(Address, u64)],
    borrows: &[(Address, u64)],
    group: u8,
) -> ObligationRecord {
    let mut record = ObligationRecord {
        lending_market: market.address,
        owner,
        elevation_group: group,
        deposits: vec![ObligationCollateral::default(); 8],
        borrows: vec![ObligationLiquidity::default(); 5],
        ..Default::default()
    };
    for (i, (reserve, amount)) in deposits.iter().enumerate() {
        record.deposits[i] = ObligationCollateral {
            deposit_reserve: *reserve,
            deposited_amount: *amount,
            market_value_sf: 0,
        };
    }
    for (i, (reserve, amount)) in borrows.iter().enumerate() {
        record.borrows[i] = ObligationLiquidity {
            borrow_reserve: *reserve,
            cumulative_borrow_rate_bsf: Fraction::ONE.to_bits(),
            borrowed_amount_sf: Fraction::from_num(*amount).to_bits(),
            market_value_sf: 0,
        };
    }
    record
}

pub fn ledger(
    market: &MarketView,
    owner: Address,
    deposits: &[(Address, u64)],
    borrows: &[(Address, u64)],
    group: u8,
) -> PositionLedger {
    let record = obligation_record(market, owner, deposits, borrows, group);
    match PositionLedger::from_record(market, Address::new_unique(), record, SLOT, None) {
        Ok(ledger) => ledger,
        Err(e) => panic!("fixture obligation invalid: {}", e),
    }
}

pub fn resolved(ledger: PositionLedger) -> ObligationRef {
    ObligationRef::Resolved(Box::new(ledger))
}

pub fn pending(owner: Address, market: &MarketView) -> ObligationRef {
    ObligationRef::Pending(ObligationDescriptor::vanilla(owner, market.address))
}

pub fn kinds(ixs: &[Instruction]) -> Vec<&'static str> {
    ixs.iter().map(|ix| ix.name()).collect()
}

pub fn count(ixs: &[Instruction], name: &str) -> usize {
    ixs.iter().filter(|ix| ix.name() == name).count()
}
