// 6.0 obligation.rs: position ledger. a decoded obligation becomes per-pool
// positions valued in quote currency, aggregated eagerly into ObligationStats.
// simulate works on copies.
// risk params follow the elevation group: group 0 uses each pool's own ltv,
// threshold and borrow factor, any other group uses the tier's ltv and threshold
// with borrow factor 1.

use crate::config::ProgramIds;
use crate::fraction::Fraction;
use crate::integration::{AccountDecoder, AccountKind, AddressDeriver, ChainError, DecodeError, LedgerReader};
use crate::market::{MarketError, MarketView};
use crate::reserve::{ReserveError, ReserveView};
use crate::types::{Address, ErrorKind, Slot};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

// 6.0: ledger records

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObligationCollateral {
    pub deposit_reserve: Address,
    // collateral shares, not liquidity
    pub deposited_amount: u64,
    pub market_value_sf: u128,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObligationLiquidity {
    pub borrow_reserve: Address,
    // reserve borrow index at the time of the last obligation refresh
    pub cumulative_borrow_rate_bsf: u128,
    pub borrowed_amount_sf: u128,
    pub market_value_sf: u128,
}

/// Decoded obligation account. Unused slots carry the default address.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObligationRecord {
    pub tag: u8,
    pub last_update_slot: Slot,
    pub lending_market: Address,
    pub owner: Address,
    pub deposits: Vec<ObligationCollateral>,
    pub borrows: Vec<ObligationLiquidity>,
    pub elevation_group: u8,
    pub referrer: Address,
}

impl ObligationRecord {
    pub fn active_deposits(&self) -> impl Iterator<Item = &ObligationCollateral> {
        self.deposits.iter().filter(|d| !d.deposit_reserve.is_default())
    }

    pub fn active_borrows(&self) -> impl Iterator<Item = &ObligationLiquidity> {
        self.borrows.iter().filter(|b| !b.borrow_reserve.is_default())
    }
}

// 6.1: identity

/// Seed layout of an obligation address. The tag is stored on the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObligationType {
    Vanilla,
    Multiply { collateral_mint: Address, debt_mint: Address },
    Lending { mint: Address },
    Leverage { collateral_mint: Address, debt_mint: Address },
}

impl ObligationType {
    pub fn tag(&self) -> u8 {
        match self {
            ObligationType::Vanilla => 0,
            ObligationType::Multiply { .. } => 1,
            ObligationType::Lending { .. } => 2,
            ObligationType::Leverage { .. } => 3,
        }
    }

    pub fn seeds(&self) -> (Address, Address) {
        match self {
            ObligationType::Vanilla => (Address::default(), Address::default()),
            ObligationType::Multiply { collateral_mint, debt_mint }
            | ObligationType::Leverage { collateral_mint, debt_mint } => (*collateral_mint, *debt_mint),
            ObligationType::Lending { mint } => (*mint, *mint),
        }
    }
}

/// An obligation that may not exist on the ledger yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObligationDescriptor {
    pub owner: Address,
    pub lending_market: Address,
    pub obligation_type: ObligationType,
    pub id: u8,
}

impl ObligationDescriptor {
    pub fn vanilla(owner: Address, lending_market: Address) -> Self {
        Self {
            owner,
            lending_market,
            obligation_type: ObligationType::Vanilla,
            id: 0,
        }
    }

    pub fn address(&self, deriver: &dyn AddressDeriver, programs: &ProgramIds) -> Address {
        let (seed1, seed2) = self.obligation_type.seeds();
        deriver.obligation(
            programs,
            self.obligation_type.tag(),
            self.id,
            &self.owner,
            &self.lending_market,
            &seed1,
            &seed2,
        )
    }
}

#[derive(Debug, Clone)]
pub enum ObligationRef {
    Resolved(Box<PositionLedger>),
    Pending(ObligationDescriptor),
}

impl ObligationRef {
    pub fn address(&self, deriver: &dyn AddressDeriver, programs: &ProgramIds) -> Address {
        match self {
            ObligationRef::Resolved(ledger) => ledger.address,
            ObligationRef::Pending(descriptor) => descriptor.address(deriver, programs),
        }
    }

    pub fn owner(&self) -> Address {
        match self {
            ObligationRef::Resolved(ledger) => ledger.owner,
            ObligationRef::Pending(descriptor) => descriptor.owner,
        }
    }

    pub fn ledger(&self) -> Option<&PositionLedger> {
        match self {
            ObligationRef::Resolved(ledger) => Some(ledger),
            ObligationRef::Pending(_) => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, ObligationRef::Pending(_))
    }
}

// 6.2: positions and aggregates

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub reserve_address: Address,
    pub mint_address: Address,
    // liquidity base units
    pub amount: Fraction,
    pub market_value: Fraction,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObligationStats {
    pub user_total_deposit: Decimal,
    pub user_total_collateral_deposit: Decimal,
    pub user_total_liquidatable_deposit: Decimal,
    pub user_total_borrow: Decimal,
    pub user_total_borrow_borrow_factor_adjusted: Decimal,
    pub borrow_limit: Decimal,
    pub borrow_liquidation_limit: Decimal,
    pub borrow_utilization: Decimal,
    pub net_account_value: Decimal,
    pub loan_to_value: Decimal,
    pub liquidation_ltv: Decimal,
    // None when net value is not positive
    pub leverage: Option<Decimal>,
    pub potential_elevation_groups: BTreeSet<u8>,
}

/// Pre-computed exchange rates / borrow indices, keyed by reserve. Missing
/// entries fall back to the reserve's own estimate at the ledger slot.
#[derive(Debug, Clone, Default)]
pub struct RateOverrides {
    pub exchange_rates: HashMap<Address, Fraction>,
    pub cumulative_borrow_rates: HashMap<Address, Fraction>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SimulationAction {
    Deposit,
    Withdraw,
    Borrow,
    Repay,
    DepositAndBorrow,
    RepayAndWithdraw,
}

impl SimulationAction {
    pub fn is_composite(&self) -> bool {
        match self {
            SimulationAction::DepositAndBorrow | SimulationAction::RepayAndWithdraw => true,
            SimulationAction::Deposit
            | SimulationAction::Withdraw
            | SimulationAction::Borrow
            | SimulationAction::Repay => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimulationLeg {
    pub mint: Address,
    pub amount: u64,
}

/// Amounts are liquidity base units. `outflow` is the borrow or withdraw leg of
/// a composite action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationParams {
    pub action: SimulationAction,
    pub mint: Address,
    pub amount: u64,
    pub outflow: Option<SimulationLeg>,
    pub elevation_group: Option<u8>,
}

impl SimulationParams {
    pub fn new(action: SimulationAction, mint: Address, amount: u64) -> Self {
        Self {
            action,
            mint,
            amount,
            outflow: None,
            elevation_group: None,
        }
    }

    pub fn with_outflow(mut self, mint: Address, amount: u64) -> Self {
        self.outflow = Some(SimulationLeg { mint, amount });
        self
    }

    pub fn with_elevation_group(mut self, group: u8) -> Self {
        self.elevation_group = Some(group);
        self
    }
}

#[derive(Debug, Clone)]
pub struct SimulationResult {
    pub stats: ObligationStats,
    pub deposits: BTreeMap<Address, Position>,
    pub borrows: BTreeMap<Address, Position>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delta {
    AddDeposit,
    RemoveDeposit,
    AddDebt,
    RemoveDebt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionSide {
    Deposit,
    Borrow,
}

/// Loaded obligation. Stats are computed once at construction.
#[derive(Debug, Clone)]
pub struct PositionLedger {
    pub address: Address,
    pub owner: Address,
    pub lending_market: Address,
    pub elevation_group: u8,
    pub referrer: Address,
    pub slot: Slot,
    deposits: BTreeMap<Address, Position>,
    borrows: BTreeMap<Address, Position>,
    stats: ObligationStats,
    record: ObligationRecord,
}

impl PositionLedger {
    /// Walks the record's non-empty slots and values every position at `slot`.
    pub fn from_record(
        market: &MarketView,
        address: Address,
        record: ObligationRecord,
        slot: Slot,
        overrides: Option<&RateOverrides>,
    ) -> Result<Self, ObligationError> {
        let mut deposits = BTreeMap::new();
        for deposit in record.active_deposits() {
            let reserve = market.reserve(&deposit.deposit_reserve)?;
            let rate = overrides
                .and_then(|o| o.exchange_rates.get(&reserve.address).copied())
                .unwrap_or_else(|| reserve.estimated_exchange_rate(slot));
            let amount = Fraction::from_num(deposit.deposited_amount) / rate;
            deposits.insert(reserve.address, position(reserve, amount)?);
        }

        let mut borrows = BTreeMap::new();
        for borrow in record.active_borrows() {
            let reserve = market.reserve(&borrow.borrow_reserve)?;
            let index = overrides
                .and_then(|o| o.cumulative_borrow_rates.get(&reserve.address).copied())
                .unwrap_or_else(|| reserve.estimated_cumulative_borrow_rate(slot));
            let amount = accrue(borrow, index);
            borrows.insert(reserve.address, position(reserve, amount)?);
        }

        let stats = compute_stats(market, &deposits, &borrows, record.elevation_group)?;
        Ok(Self {
            address,
            owner: record.owner,
            lending_market: record.lending_market,
            elevation_group: record.elevation_group,
            referrer: record.referrer,
            slot,
            deposits,
            borrows,
            stats,
            record,
        })
    }

    /// Ledger for an obligation that does not exist yet.
    pub fn empty(address: Address, owner: Address, lending_market: Address) -> Self {
        Self {
            address,
            owner,
            lending_market,
            elevation_group: 0,
            referrer: Address::default(),
            slot: 0,
            deposits: BTreeMap::new(),
            borrows: BTreeMap::new(),
            stats: ObligationStats::default(),
            record: ObligationRecord {
                lending_market,
                owner,
                ..Default::default()
            },
        }
    }

    pub async fn load(
        reader: &dyn LedgerReader,
        decoder: &dyn AccountDecoder,
        market: &MarketView,
        address: Address,
    ) -> Result<Self, ObligationError> {
        let data = reader
            .fetch_account(&address)
            .await?
            .ok_or(ObligationError::ObligationNotFound(address))?;
        let record = decoder.decode(AccountKind::Obligation, &data)?.into_obligation()?;
        let slot = reader.current_slot().await?;
        Self::from_record(market, address, record, slot, None)
    }

    /// Batch load. Addresses with no account come back as `None`.
    pub async fn load_many(
        reader: &dyn LedgerReader,
        decoder: &dyn AccountDecoder,
        market: &MarketView,
        addresses: &[Address],
    ) -> Result<Vec<Option<Self>>, ObligationError> {
        let accounts = reader.fetch_accounts(addresses).await?;
        let slot = reader.current_slot().await?;
        let mut out = Vec::with_capacity(addresses.len());
        for (address, data) in addresses.iter().zip(accounts) {
            let ledger = match data {
                Some(data) => {
                    let record = decoder.decode(AccountKind::Obligation, &data)?.into_obligation()?;
                    Some(Self::from_record(market, *address, record, slot, None)?)
                }
                None => None,
            };
            out.push(ledger);
        }
        Ok(out)
    }

    pub fn stats(&self) -> &ObligationStats {
        &self.stats
    }

    pub fn record(&self) -> &ObligationRecord {
        &self.record
    }

    pub fn deposits(&self) -> &BTreeMap<Address, Position> {
        &self.deposits
    }

    pub fn borrows(&self) -> &BTreeMap<Address, Position> {
        &self.borrows
    }

    pub fn deposit(&self, reserve: &Address) -> Option<&Position> {
        self.deposits.get(reserve)
    }

    pub fn borrow(&self, reserve: &Address) -> Option<&Position> {
        self.borrows.get(reserve)
    }

    /// Deposit pools in record slot order.
    pub fn deposit_reserves(&self) -> Vec<Address> {
        self.record.active_deposits().map(|d| d.deposit_reserve).collect()
    }

    /// Borrow pools in record slot order.
    pub fn borrow_reserves(&self) -> Vec<Address> {
        self.record.active_borrows().map(|b| b.borrow_reserve).collect()
    }

    /// Every pool the obligation touches, either side.
    pub fn touched_reserves(&self) -> BTreeSet<Address> {
        self.deposits.keys().chain(self.borrows.keys()).copied().collect()
    }

    pub fn has_debt(&self) -> bool {
        !self.borrows.is_empty()
    }

    // convenience accessors
    pub fn loan_to_value(&self) -> Decimal {
        self.stats.loan_to_value
    }

    pub fn liquidation_ltv(&self) -> Decimal {
        self.stats.liquidation_ltv
    }

    pub fn net_account_value(&self) -> Decimal {
        self.stats.net_account_value
    }

    pub fn leverage(&self) -> Option<Decimal> {
        self.stats.leverage
    }

    /// Debt in `reserve` compounded to `slot`. Zero when there is no such borrow.
    pub fn borrowed_amount_at(&self, market: &MarketView, reserve: &Address, slot: Slot) -> Result<Fraction, ObligationError> {
        let view = market.reserve(reserve)?;
        let borrow = match self.record.active_borrows().find(|b| b.borrow_reserve == *reserve) {
            Some(b) => b,
            None => return Ok(Fraction::ZERO),
        };
        Ok(accrue(borrow, view.estimated_cumulative_borrow_rate(slot)))
    }

    /// Tiers every touched pool (plus `extra`) supports.
    pub fn potential_elevation_groups(&self, market: &MarketView, extra: &[Address]) -> Result<BTreeSet<u8>, ObligationError> {
        let mut addresses = self.touched_reserves();
        addresses.extend(extra.iter().copied());
        let reserves = addresses
            .iter()
            .map(|a| market.reserve(a).map(|r| &**r))
            .collect::<Result<Vec<&ReserveView>, MarketError>>()?;
        Ok(market.common_elevation_groups(&reserves))
    }

    /// Largest amount of `reserve` that can still be borrowed, capped by pool liquidity.
    pub fn max_borrowable_amount(&self, market: &MarketView, reserve: &Address) -> Result<u64, ObligationError> {
        let view = market.reserve(reserve)?;
        if self.elevation_group != 0 && !view.supports_elevation_group(self.elevation_group) {
            return Ok(0);
        }
        let headroom = self.stats.borrow_limit - self.stats.user_total_borrow_borrow_factor_adjusted;
        if headroom <= Decimal::ZERO {
            return Ok(0);
        }
        let (_, _, borrow_factor) = risk_params(market, view, self.elevation_group)?;
        let price = view.oracle_price()?.to_decimal();
        if price.is_zero() || borrow_factor.is_zero() {
            return Ok(0);
        }
        let amount = to_base_units(headroom / borrow_factor / price, view)?;
        Ok(amount.min(view.state.liquidity.available_amount))
    }

    /// Largest amount of a deposit that can leave without breaching the borrow limit.
    pub fn max_withdraw_amount(&self, market: &MarketView, reserve: &Address) -> Result<u64, ObligationError> {
        let view = market.reserve(reserve)?;
        let position = self.deposits.get(reserve).ok_or(ObligationError::PositionNotFound {
            reserve: *reserve,
            side: PositionSide::Deposit,
        })?;
        let held = position.amount.to_floor();
        let (ltv, _, _) = risk_params(market, view, self.elevation_group)?;
        if !self.has_debt() || ltv.is_zero() {
            return Ok(held);
        }
        let headroom = self.stats.borrow_limit - self.stats.user_total_borrow_borrow_factor_adjusted;
        if headroom <= Decimal::ZERO {
            return Ok(0);
        }
        let price = view.oracle_price()?.to_decimal();
        if price.is_zero() {
            return Ok(0);
        }
        Ok(to_base_units(headroom / ltv / price, view)?.min(held))
    }

    /// Applies the action to copies of the position maps and recomputes stats.
    pub fn simulate(&self, market: &MarketView, params: &SimulationParams) -> Result<SimulationResult, ObligationError> {
        let group = params.elevation_group.unwrap_or(self.elevation_group);
        let mut deposits = self.deposits.clone();
        let mut borrows = self.borrows.clone();

        let primary: &ReserveView = market.reserve_by_mint(&params.mint)?;
        let outflow: Option<(&ReserveView, u64)> = match (params.action.is_composite(), params.outflow) {
            (true, Some(leg)) => Some((market.reserve_by_mint(&leg.mint)?.as_ref(), leg.amount)),
            (true, None) => return Err(ObligationError::MissingOutflow(params.action)),
            (false, _) => None,
        };

        let steps: Vec<(Delta, &ReserveView, u64)> = match (params.action, outflow) {
            (SimulationAction::Deposit, _) => vec![(Delta::AddDeposit, primary, params.amount)],
            (SimulationAction::Withdraw, _) => vec![(Delta::RemoveDeposit, primary, params.amount)],
            (SimulationAction::Borrow, _) => vec![(Delta::AddDebt, primary, params.amount)],
            (SimulationAction::Repay, _) => vec![(Delta::RemoveDebt, primary, params.amount)],
            (SimulationAction::DepositAndBorrow, Some((out, out_amount))) => vec![
                (Delta::AddDeposit, primary, params.amount),
                (Delta::AddDebt, out, out_amount),
            ],
            (SimulationAction::RepayAndWithdraw, Some((out, out_amount))) => vec![
                (Delta::RemoveDebt, primary, params.amount),
                (Delta::RemoveDeposit, out, out_amount),
            ],
            (action, None) => return Err(ObligationError::MissingOutflow(action)),
        };

        for (delta, reserve, amount) in steps {
            if group != 0 && !reserve.supports_elevation_group(group) {
                return Err(ObligationError::TierMismatch {
                    reserve: reserve.address,
                    elevation_group: group,
                });
            }
            apply_delta(&mut deposits, &mut borrows, delta, reserve, amount)?;
        }

        let stats = compute_stats(market, &deposits, &borrows, group)?;
        Ok(SimulationResult { stats, deposits, borrows })
    }
}

fn position(reserve: &ReserveView, amount: Fraction) -> Result<Position, ObligationError> {
    Ok(Position {
        reserve_address: reserve.address,
        mint_address: reserve.mint(),
        amount,
        market_value: reserve.market_value(amount)?,
    })
}

// borrowed * current_index / index_at_last_refresh
fn accrue(borrow: &ObligationLiquidity, index: Fraction) -> Fraction {
    let amount = Fraction::from_bits(borrow.borrowed_amount_sf);
    let previous = Fraction::from_bits(borrow.cumulative_borrow_rate_bsf);
    if previous.is_zero() || index <= previous {
        return amount;
    }
    amount * index / previous
}

fn to_base_units(tokens: Decimal, reserve: &ReserveView) -> Result<u64, ReserveError> {
    let factor = reserve.mint_factor()?.to_decimal();
    Ok(tokens
        .checked_mul(factor)
        .and_then(|units| units.floor().to_u64())
        .unwrap_or(u64::MAX))
}

fn apply_delta(
    deposits: &mut BTreeMap<Address, Position>,
    borrows: &mut BTreeMap<Address, Position>,
    delta: Delta,
    reserve: &ReserveView,
    amount: u64,
) -> Result<(), ObligationError> {
    let amount = Fraction::from_num(amount);
    let value = reserve.market_value(amount)?;
    let (map, side) = match delta {
        Delta::AddDeposit | Delta::RemoveDeposit => (deposits, PositionSide::Deposit),
        Delta::AddDebt | Delta::RemoveDebt => (borrows, PositionSide::Borrow),
    };
    match delta {
        Delta::AddDeposit | Delta::AddDebt => {
            let entry = map.entry(reserve.address).or_insert_with(|| Position {
                reserve_address: reserve.address,
                mint_address: reserve.mint(),
                amount: Fraction::ZERO,
                market_value: Fraction::ZERO,
            });
            entry.amount += amount;
            entry.market_value += value;
        }
        Delta::RemoveDeposit | Delta::RemoveDebt => {
            let entry = map.get_mut(&reserve.address).ok_or(ObligationError::PositionNotFound {
                reserve: reserve.address,
                side,
            })?;
            // clamps at zero
            entry.amount -= amount;
            entry.market_value -= value;
            if entry.amount.is_zero() {
                map.remove(&reserve.address);
            }
        }
    }
    Ok(())
}

// (ltv, liquidation threshold, borrow factor) as ratios
fn risk_params(market: &MarketView, reserve: &ReserveView, group: u8) -> Result<(Decimal, Decimal, Decimal), ObligationError> {
    let hundred = Decimal::ONE_HUNDRED;
    if group == 0 {
        let config = &reserve.state.config;
        return Ok((
            Decimal::from(config.loan_to_value_pct) / hundred,
            Decimal::from(config.liquidation_threshold_pct) / hundred,
            Decimal::from(config.borrow_factor_pct) / hundred,
        ));
    }
    let tier = market.elevation_group(group)?;
    Ok((
        Decimal::from(tier.ltv_pct) / hundred,
        Decimal::from(tier.liquidation_threshold_pct) / hundred,
        Decimal::ONE,
    ))
}

fn compute_stats(
    market: &MarketView,
    deposits: &BTreeMap<Address, Position>,
    borrows: &BTreeMap<Address, Position>,
    group: u8,
) -> Result<ObligationStats, ObligationError> {
    let mut stats = ObligationStats::default();
    let mut touched: Vec<&ReserveView> = Vec::with_capacity(deposits.len() + borrows.len());

    for position in deposits.values() {
        let reserve = market.reserve(&position.reserve_address)?;
        let (ltv, liq_threshold, _) = risk_params(market, reserve, group)?;
        let value = position.market_value.to_decimal();
        stats.user_total_deposit += value;
        if !ltv.is_zero() {
            stats.user_total_collateral_deposit += value;
        }
        if !liq_threshold.is_zero() {
            stats.user_total_liquidatable_deposit += value;
        }
        stats.borrow_limit += value * ltv;
        stats.borrow_liquidation_limit += value * liq_threshold;
        touched.push(reserve);
    }

    for position in borrows.values() {
        let reserve = market.reserve(&position.reserve_address)?;
        let (_, _, borrow_factor) = risk_params(market, reserve, group)?;
        let value = position.market_value.to_decimal();
        stats.user_total_borrow += value;
        stats.user_total_borrow_borrow_factor_adjusted += value * borrow_factor;
        touched.push(reserve);
    }

    stats.net_account_value = stats.user_total_deposit - stats.user_total_borrow;
    if !stats.user_total_deposit.is_zero() {
        stats.loan_to_value = stats.user_total_borrow_borrow_factor_adjusted / stats.user_total_deposit;
        stats.liquidation_ltv = stats.borrow_liquidation_limit / stats.user_total_deposit;
    }
    if !stats.borrow_limit.is_zero() {
        stats.borrow_utilization = stats.user_total_borrow_borrow_factor_adjusted / stats.borrow_limit;
    }
    if stats.net_account_value > Decimal::ZERO {
        stats.leverage = Some(stats.user_total_deposit / stats.net_account_value);
    }
    stats.potential_elevation_groups = market.common_elevation_groups(&touched);
    Ok(stats)
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ObligationError {
    #[error("Obligation {0} not found")]
    ObligationNotFound(Address),

    #[error("No {side:?} position in reserve {reserve}")]
    PositionNotFound { reserve: Address, side: PositionSide },

    #[error("Reserve {reserve} is not part of elevation group {elevation_group}")]
    TierMismatch { reserve: Address, elevation_group: u8 },

    #[error("{0:?} needs an outflow leg")]
    MissingOutflow(SimulationAction),

    #[error("Market error: {0}")]
    Market(#[from] MarketError),

    #[error("Reserve error: {0}")]
    Reserve(#[from] ReserveError),

    #[error("Ledger error: {0}")]
    Chain(#[from] ChainError),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),
}

impl ObligationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ObligationError::ObligationNotFound(_) | ObligationError::PositionNotFound { .. } => ErrorKind::NotFound,
            ObligationError::TierMismatch { .. } => ErrorKind::TierMismatch,
            ObligationError::MissingOutflow(_) => ErrorKind::InvalidState,
            ObligationError::Market(e) => e.kind(),
            ObligationError::Reserve(e) => e.kind(),
            ObligationError::Chain(e) => e.kind(),
            ObligationError::Decode(e) => e.kind(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{group, market_with, reserve_view};
    use rust_decimal_macros::dec;

    fn record(market: &MarketView, deposits: &[(Address, u64)], borrows: &[(Address, u64)], group: u8) -> ObligationRecord {
        let mut record = ObligationRecord {
            lending_market: market.address,
            owner: Address::new_unique(),
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

    #[test]
    fn empty_slots_are_skipped() {
        let usdc = reserve_view("USDC", 75, 85, 1, 6);
        let addr = usdc.address;
        let market = market_with(vec![usdc], vec![]);
        let rec = record(&market, &[(addr, 100_000_000)], &[], 0);
        let ledger = PositionLedger::from_record(&market, Address::new_unique(), rec, 0, None).unwrap();

        assert_eq!(ledger.deposits().len(), 1);
        assert!(ledger.borrows().is_empty());
        assert_eq!(ledger.deposit_reserves(), vec![addr]);
        assert_eq!(ledger.stats().user_total_deposit, dec!(100));
        assert_eq!(ledger.stats().borrow_limit, dec!(75));
        assert_eq!(ledger.loan_to_value(), Decimal::ZERO);
        assert_eq!(ledger.leverage(), Some(Decimal::ONE));
    }

    #[test]
    fn stats_are_consistent() {
        let usdc = reserve_view("USDC", 75, 85, 1, 6);
        let mut sol = reserve_view("SOL", 65, 75, 100, 9);
        sol.state.config.borrow_factor_pct = 150;
        let (u, s) = (usdc.address, sol.address);
        let market = market_with(vec![usdc, sol], vec![]);
        // 1000 USDC collateral, 2 SOL debt at $100
        let rec = record(&market, &[(u, 1_000_000_000)], &[(s, 2_000_000_000)], 0);
        let ledger = PositionLedger::from_record(&market, Address::new_unique(), rec, 0, None).unwrap();
        let stats = ledger.stats();

        assert_eq!(stats.user_total_deposit, dec!(1000));
        assert_eq!(stats.user_total_borrow, dec!(200));
        assert_eq!(stats.user_total_borrow_borrow_factor_adjusted, dec!(300));
        assert_eq!(stats.net_account_value, stats.user_total_deposit - stats.user_total_borrow);
        assert_eq!(stats.loan_to_value, dec!(0.3));
        assert_eq!(stats.liquidation_ltv, dec!(0.85));
        assert_eq!(stats.borrow_utilization, dec!(0.4));
        assert_eq!(stats.leverage, Some(dec!(1.25)));
    }

    #[test]
    fn tier_overrides_pool_parameters() {
        let mut jito = reserve_view("JITOSOL", 75, 80, 100, 9);
        let mut sol = reserve_view("SOL", 75, 80, 100, 9);
        jito.state.config.elevation_groups = vec![1];
        sol.state.config.elevation_groups = vec![1];
        sol.state.config.borrow_factor_pct = 200;
        let (j, s, sol_mint) = (jito.address, sol.address, sol.mint());
        let market = market_with(vec![jito, sol], vec![group(1, 90, 92)]);

        let rec = record(&market, &[(j, 10_000_000_000)], &[(s, 1_000_000_000)], 1);
        let ledger = PositionLedger::from_record(&market, Address::new_unique(), rec, 0, None).unwrap();
        assert_eq!(ledger.stats().borrow_limit, dec!(900));
        // borrow factor degrades to 1 inside a tier
        assert_eq!(ledger.stats().user_total_borrow_borrow_factor_adjusted, dec!(100));
        assert_eq!(ledger.stats().liquidation_ltv, dec!(0.92));

        let sim = ledger
            .simulate(&market, &SimulationParams::new(SimulationAction::Borrow, sol_mint, 1_000_000_000))
            .unwrap();
        assert_eq!(sim.stats.borrow_limit, dec!(900));
        assert_eq!(sim.stats.loan_to_value, dec!(0.2));
    }

    #[test]
    fn missing_tier_is_configuration_error() {
        let usdc = reserve_view("USDC", 75, 85, 1, 6);
        let addr = usdc.address;
        let market = market_with(vec![usdc], vec![]);
        let rec = record(&market, &[(addr, 1_000_000)], &[], 4);
        let err = PositionLedger::from_record(&market, Address::new_unique(), rec, 0, None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn simulation_does_not_mutate() {
        let usdc = reserve_view("USDC", 75, 85, 1, 6);
        let (addr, mint) = (usdc.address, usdc.mint());
        let market = market_with(vec![usdc], vec![]);
        let rec = record(&market, &[(addr, 100_000_000)], &[], 0);
        let ledger = PositionLedger::from_record(&market, Address::new_unique(), rec, 0, None).unwrap();

        let sim = ledger
            .simulate(&market, &SimulationParams::new(SimulationAction::Deposit, mint, 50_000_000))
            .unwrap();
        assert_eq!(sim.stats.user_total_deposit, dec!(150));
        assert_eq!(ledger.stats().user_total_deposit, dec!(100));
    }

    #[test]
    fn removing_absent_position_is_not_found() {
        let usdc = reserve_view("USDC", 75, 85, 1, 6);
        let mint = usdc.mint();
        let market = market_with(vec![usdc], vec![]);
        let ledger = PositionLedger::empty(Address::new_unique(), Address::new_unique(), market.address);

        let err = ledger
            .simulate(&market, &SimulationParams::new(SimulationAction::Repay, mint, 1))
            .unwrap_err();
        assert!(matches!(err, ObligationError::PositionNotFound { side: PositionSide::Borrow, .. }));
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn composite_without_outflow_is_invalid_state() {
        let usdc = reserve_view("USDC", 75, 85, 1, 6);
        let mint = usdc.mint();
        let market = market_with(vec![usdc], vec![]);
        let ledger = PositionLedger::empty(Address::new_unique(), Address::new_unique(), market.address);
        let err = ledger
            .simulate(&market, &SimulationParams::new(SimulationAction::DepositAndBorrow, mint, 1))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }

    #[test]
    fn simulating_outside_tier_is_tier_mismatch() {
        let mut jito = reserve_view("JITOSOL", 75, 80, 100, 9);
        let usdc = reserve_view("USDC", 75, 85, 1, 6);
        jito.state.config.elevation_groups = vec![1];
        let (j, usdc_mint) = (jito.address, usdc.mint());
        let market = market_with(vec![jito, usdc], vec![group(1, 90, 92)]);
        let rec = record(&market, &[(j, 1_000_000_000)], &[], 1);
        let ledger = PositionLedger::from_record(&market, Address::new_unique(), rec, 0, None).unwrap();

        let err = ledger
            .simulate(&market, &SimulationParams::new(SimulationAction::Borrow, usdc_mint, 1_000_000))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TierMismatch);

        // dropping back to tier 0 through the override lifts the constraint
        let ok = ledger.simulate(
            &market,
            &SimulationParams::new(SimulationAction::Borrow, usdc_mint, 1_000_000).with_elevation_group(0),
        );
        assert!(ok.is_ok());
    }

    #[test]
    fn deposit_then_borrow_end_to_end() {
        let usdc = reserve_view("USDC", 75, 85, 1, 6);
        let mint = usdc.mint();
        let market = market_with(vec![usdc], vec![]);
        let ledger = PositionLedger::empty(Address::new_unique(), Address::new_unique(), market.address);

        let deposited = ledger
            .simulate(&market, &SimulationParams::new(SimulationAction::Deposit, mint, 100_000_000))
            .unwrap();
        assert!(deposited.stats.user_total_deposit > Decimal::ZERO);
        assert_eq!(deposited.stats.user_total_borrow, Decimal::ZERO);
        assert_eq!(deposited.stats.loan_to_value, Decimal::ZERO);

        // half of the 75 borrow capacity
        let both = ledger
            .simulate(
                &market,
                &SimulationParams::new(SimulationAction::DepositAndBorrow, mint, 100_000_000)
                    .with_outflow(mint, 37_500_000),
            )
            .unwrap();
        assert_eq!(both.stats.borrow_utilization, dec!(0.5));
        assert!(both.stats.loan_to_value > Decimal::ZERO);
        assert!(both.stats.loan_to_value < both.stats.liquidation_ltv);
    }

    #[test]
    fn borrowed_amount_compounds() {
        let usdc = reserve_view("USDC", 75, 85, 1, 6);
        let sol = reserve_view("SOL", 65, 75, 100, 9);
        let (u, s) = (usdc.address, sol.address);
        let mut market = market_with(vec![usdc, sol], vec![]);
        // make the SOL pool utilized so its rate is non-zero
        let mut busy = market.reserve(&s).unwrap().as_ref().clone();
        busy.state.liquidity.borrowed_amount_sf = Fraction::from_num(500_000_000_000_000).to_bits();
        market.insert_reserve(busy);

        let rec = record(&market, &[(u, 1_000_000_000)], &[(s, 1_000_000_000)], 0);
        let ledger = PositionLedger::from_record(&market, Address::new_unique(), rec, 0, None).unwrap();
        let now = ledger.borrowed_amount_at(&market, &s, 0).unwrap();
        let later = ledger.borrowed_amount_at(&market, &s, 1_000_000).unwrap();
        assert_eq!(now, Fraction::from_num(1_000_000_000));
        assert!(later > now);
        assert_eq!(ledger.borrowed_amount_at(&market, &u, 0).unwrap(), Fraction::ZERO);
    }

    #[test]
    fn max_borrow_and_withdraw() {
        let usdc = reserve_view("USDC", 75, 85, 1, 6);
        let (u, mint) = (usdc.address, usdc.mint());
        let market = market_with(vec![usdc], vec![]);
        let rec = record(&market, &[(u, 100_000_000)], &[], 0);
        let ledger = PositionLedger::from_record(&market, Address::new_unique(), rec, 0, None).unwrap();

        assert_eq!(ledger.max_borrowable_amount(&market, &u).unwrap(), 75_000_000);
        assert_eq!(ledger.max_withdraw_amount(&market, &u).unwrap(), 100_000_000);

        let sim = ledger
            .simulate(&market, &SimulationParams::new(SimulationAction::Borrow, mint, 30_000_000))
            .unwrap();
        assert_eq!(sim.stats.borrow_limit - sim.stats.user_total_borrow_borrow_factor_adjusted, dec!(45));
    }

    #[test]
    fn pending_reference_derives_address() {
        struct Fixed(Address);
        impl AddressDeriver for Fixed {
            fn find_program_address(&self, _seeds: &[&[u8]], _program: &Address) -> Address {
                self.0
            }
        }
        let target = Address::new_unique();
        let descriptor = ObligationDescriptor::vanilla(Address::new_unique(), Address::new_unique());
        let pending = ObligationRef::Pending(descriptor);
        assert!(pending.is_pending());
        assert_eq!(pending.address(&Fixed(target), &ProgramIds::default()), target);
        assert_eq!(pending.owner(), descriptor.owner);

        assert_eq!(ObligationType::Lending { mint: target }.seeds(), (target, target));
        assert_eq!(ObligationType::Vanilla.tag(), 0);
    }
}
