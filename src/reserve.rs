// 4.0 reserve.rs: decoded reserve snapshot plus a cached oracle price.
// everything derived (exchange rate, utilization, rates, caps) is a pure function
// of the snapshot and the caller's slot. a refresh builds a new view, only the
// price is ever set in place.

use crate::fraction::Fraction;
use crate::integration::{OracleConfig, OraclePrice};
use crate::interest::{apr_to_apy, compound, compounded_interest, BorrowRateCurve};
use crate::obligation::SimulationAction;
use crate::types::{Address, ErrorKind, Slot};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 10^19 is the largest power of ten a u64 holds.
pub const MAX_MINT_DECIMALS: u8 = 19;

/// Shares per unit of liquidity for a pool with nothing minted yet.
pub const INITIAL_COLLATERAL_RATE: u64 = 1;

/// Which reward program of a reserve an action touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FarmMode {
    Collateral,
    Debt,
}

impl FarmMode {
    pub fn as_u8(&self) -> u8 {
        match self {
            FarmMode::Collateral => 0,
            FarmMode::Debt => 1,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReserveLiquidity {
    pub mint: Address,
    pub mint_decimals: u8,
    pub supply_vault: Address,
    pub fee_vault: Address,
    pub token_program: Address,
    pub available_amount: u64,
    pub borrowed_amount_sf: u128,
    pub cumulative_borrow_rate_bsf: u128,
    pub accumulated_protocol_fees_sf: u128,
    pub accumulated_referrer_fees_sf: u128,
    pub pending_referrer_fees_sf: u128,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReserveCollateral {
    pub mint: Address,
    pub mint_total_supply: u64,
    pub supply_vault: Address,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReserveConfig {
    pub token_symbol: String,
    pub loan_to_value_pct: u8,
    pub liquidation_threshold_pct: u8,
    pub min_liquidation_bonus_bps: u16,
    pub max_liquidation_bonus_bps: u16,
    // 100 = debt counts at face value
    pub borrow_factor_pct: u64,
    pub protocol_take_rate_pct: u8,
    pub deposit_limit: u64,
    pub borrow_limit: u64,
    // risk tiers this pool may be used in. zero entries are padding
    pub elevation_groups: Vec<u8>,
    pub borrow_rate_curve: BorrowRateCurve,
    pub oracle: Option<OracleConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReserveState {
    pub lending_market: Address,
    pub last_update_slot: Slot,
    pub liquidity: ReserveLiquidity,
    pub collateral: ReserveCollateral,
    pub config: ReserveConfig,
    pub farm_collateral: Address,
    pub farm_debt: Address,
}

#[derive(Debug, Clone)]
pub struct ReserveView {
    pub address: Address,
    pub state: ReserveState,
    price: Option<OraclePrice>,
}

impl ReserveView {
    pub fn new(address: Address, state: ReserveState, price: Option<OraclePrice>) -> Self {
        Self { address, state, price }
    }

    pub fn symbol(&self) -> &str {
        &self.state.config.token_symbol
    }

    pub fn mint(&self) -> Address {
        self.state.liquidity.mint
    }

    pub fn collateral_mint(&self) -> Address {
        self.state.collateral.mint
    }

    pub fn token_program(&self) -> Address {
        self.state.liquidity.token_program
    }

    pub fn decimals(&self) -> u8 {
        self.state.liquidity.mint_decimals
    }

    /// 10^decimals. Mints with more than `MAX_MINT_DECIMALS` are rejected.
    pub fn mint_factor(&self) -> Result<Fraction, ReserveError> {
        10u64
            .checked_pow(self.decimals() as u32)
            .map(Fraction::from_num)
            .ok_or(ReserveError::UnsupportedDecimals {
                reserve: self.address,
                decimals: self.decimals(),
            })
    }

    pub fn price(&self) -> Option<&OraclePrice> {
        self.price.as_ref()
    }

    pub fn set_price(&mut self, price: OraclePrice) {
        self.price = Some(price);
    }

    /// Cached oracle price. Fails instead of substituting a default.
    pub fn oracle_price(&self) -> Result<Fraction, ReserveError> {
        if self.state.config.oracle.is_none() {
            return Err(ReserveError::MissingOracleConfig(self.address));
        }
        let price = self.price.ok_or(ReserveError::MissingPrice(self.address))?;
        Ok(Fraction::from_decimal(price.price))
    }

    /// amount (base units) * price / 10^decimals
    pub fn market_value(&self, amount: Fraction) -> Result<Fraction, ReserveError> {
        let price = self.oracle_price()?;
        Ok(amount * price / self.mint_factor()?)
    }

    pub fn available_amount(&self) -> Fraction {
        Fraction::from_num(self.state.liquidity.available_amount)
    }

    pub fn borrowed_amount(&self) -> Fraction {
        Fraction::from_bits(self.state.liquidity.borrowed_amount_sf)
    }

    fn fees(&self) -> Fraction {
        let liq = &self.state.liquidity;
        Fraction::from_bits(liq.accumulated_protocol_fees_sf)
            + Fraction::from_bits(liq.accumulated_referrer_fees_sf)
            + Fraction::from_bits(liq.pending_referrer_fees_sf)
    }

    /// available + borrowed - all accrued fees
    pub fn total_supply(&self) -> Fraction {
        (self.available_amount() + self.borrowed_amount()) - self.fees()
    }

    /// Collateral shares per unit of liquidity.
    pub fn exchange_rate(&self) -> Fraction {
        Self::exchange_rate_for(self.state.collateral.mint_total_supply, self.total_supply())
    }

    fn exchange_rate_for(share_supply: u64, total_supply: Fraction) -> Fraction {
        if share_supply == 0 || total_supply.is_zero() {
            return Fraction::from_num(INITIAL_COLLATERAL_RATE);
        }
        Fraction::from_num(share_supply) / total_supply
    }

    pub fn utilization(&self) -> Fraction {
        let supply = self.total_supply();
        if supply.is_zero() {
            return Fraction::ZERO;
        }
        (self.borrowed_amount() / supply).min(Fraction::ONE)
    }

    pub fn cumulative_borrow_rate(&self) -> Fraction {
        Fraction::from_bits(self.state.liquidity.cumulative_borrow_rate_bsf)
    }

    pub fn borrow_apr(&self) -> Fraction {
        self.state.config.borrow_rate_curve.rate_at(self.utilization())
    }

    pub fn supply_apr(&self) -> Fraction {
        let keep = Fraction::ONE - self.protocol_take_rate();
        self.borrow_apr() * self.utilization() * keep
    }

    pub fn borrow_apy(&self) -> Decimal {
        apr_to_apy(self.borrow_apr().to_decimal())
    }

    pub fn supply_apy(&self) -> Decimal {
        apr_to_apy(self.supply_apr().to_decimal())
    }

    pub fn protocol_take_rate(&self) -> Fraction {
        Fraction::from_percent(self.state.config.protocol_take_rate_pct as u64)
    }

    fn elapsed(&self, slot: Slot) -> Slot {
        slot.saturating_sub(self.state.last_update_slot)
    }

    /// Extrapolates the borrow index from the last on-chain refresh to `slot`.
    pub fn estimated_cumulative_borrow_rate(&self, slot: Slot) -> Fraction {
        compound(self.cumulative_borrow_rate(), self.borrow_apr(), self.elapsed(slot))
    }

    pub fn estimated_borrowed_amount(&self, slot: Slot) -> Fraction {
        self.borrowed_amount() * compounded_interest(self.borrow_apr(), self.elapsed(slot))
    }

    /// Supply after interest accrual, net of the protocol's cut of the new interest.
    pub fn estimated_total_supply(&self, slot: Slot) -> Fraction {
        let borrowed = self.borrowed_amount();
        let new_borrowed = self.estimated_borrowed_amount(slot);
        let new_protocol_fees = (new_borrowed - borrowed) * self.protocol_take_rate();
        (self.available_amount() + new_borrowed) - self.fees() - new_protocol_fees
    }

    pub fn estimated_exchange_rate(&self, slot: Slot) -> Fraction {
        Self::exchange_rate_for(
            self.state.collateral.mint_total_supply,
            self.estimated_total_supply(slot),
        )
    }

    /// Utilization if `action` of `amount` went through. `counter_amount` is the
    /// second leg of a composite action against this same pool.
    pub fn simulated_utilization(
        &self,
        amount: Fraction,
        action: SimulationAction,
        counter_amount: Option<Fraction>,
    ) -> Fraction {
        let supply = self.total_supply();
        let borrowed = self.borrowed_amount();
        let counter = counter_amount.unwrap_or(Fraction::ZERO);
        let (borrowed, supply) = match action {
            SimulationAction::Deposit => (borrowed, supply + amount),
            SimulationAction::Withdraw => (borrowed, supply - amount),
            SimulationAction::Borrow => (borrowed + amount, supply),
            SimulationAction::Repay => (borrowed - amount, supply),
            SimulationAction::DepositAndBorrow => (borrowed + counter, supply + amount),
            SimulationAction::RepayAndWithdraw => (borrowed - amount, supply - counter),
        };
        if supply.is_zero() {
            return Fraction::ZERO;
        }
        (borrowed / supply).min(Fraction::ONE)
    }

    pub fn simulated_borrow_apr(
        &self,
        amount: Fraction,
        action: SimulationAction,
        counter_amount: Option<Fraction>,
    ) -> Fraction {
        let utilization = self.simulated_utilization(amount, action, counter_amount);
        self.state.config.borrow_rate_curve.rate_at(utilization)
    }

    pub fn deposit_limit_crossed(&self) -> bool {
        self.total_supply() > Fraction::from_num(self.state.config.deposit_limit)
    }

    pub fn borrow_limit_crossed(&self) -> bool {
        self.borrowed_amount() > Fraction::from_num(self.state.config.borrow_limit)
    }

    pub fn would_cross_deposit_limit(&self, amount: u64) -> bool {
        self.total_supply() + Fraction::from_num(amount)
            > Fraction::from_num(self.state.config.deposit_limit)
    }

    pub fn would_cross_borrow_limit(&self, amount: u64) -> bool {
        self.borrowed_amount() + Fraction::from_num(amount)
            > Fraction::from_num(self.state.config.borrow_limit)
    }

    /// TVL in quote currency.
    pub fn total_supply_value(&self) -> Result<Decimal, ReserveError> {
        Ok(self.market_value(self.total_supply())?.to_decimal())
    }

    pub fn total_borrow_value(&self) -> Result<Decimal, ReserveError> {
        Ok(self.market_value(self.borrowed_amount())?.to_decimal())
    }

    pub fn loan_to_value(&self) -> Fraction {
        Fraction::from_percent(self.state.config.loan_to_value_pct as u64)
    }

    pub fn liquidation_threshold(&self) -> Fraction {
        Fraction::from_percent(self.state.config.liquidation_threshold_pct as u64)
    }

    pub fn borrow_factor(&self) -> Fraction {
        Fraction::from_percent(self.state.config.borrow_factor_pct)
    }

    /// Tier 0 is the neutral tier and always supported.
    pub fn supports_elevation_group(&self, id: u8) -> bool {
        id == 0 || self.state.config.elevation_groups.contains(&id)
    }

    pub fn elevation_groups(&self) -> impl Iterator<Item = u8> + '_ {
        self.state
            .config
            .elevation_groups
            .iter()
            .copied()
            .filter(|id| *id != 0)
    }

    pub fn farm(&self, mode: FarmMode) -> Option<Address> {
        let farm = match mode {
            FarmMode::Collateral => self.state.farm_collateral,
            FarmMode::Debt => self.state.farm_debt,
        };
        if farm.is_default() {
            None
        } else {
            Some(farm)
        }
    }

    /// Liquidity units -> collateral shares at the estimated rate for `slot`, floored.
    pub fn liquidity_to_collateral(&self, amount: u64, slot: Slot) -> u64 {
        (Fraction::from_num(amount) * self.estimated_exchange_rate(slot)).to_floor()
    }

    pub fn collateral_to_liquidity(&self, shares: u64, slot: Slot) -> Fraction {
        Fraction::from_num(shares) / self.estimated_exchange_rate(slot)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReserveError {
    #[error("Reserve {0} has no oracle configuration")]
    MissingOracleConfig(Address),

    #[error("Reserve {0} has no resolved price")]
    MissingPrice(Address),

    #[error("Reserve {reserve} mint has {decimals} decimals, at most {max} supported", max = MAX_MINT_DECIMALS)]
    UnsupportedDecimals { reserve: Address, decimals: u8 },
}

impl ReserveError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ReserveError::MissingOracleConfig(_)
            | ReserveError::MissingPrice(_)
            | ReserveError::UnsupportedDecimals { .. } => ErrorKind::Configuration,
        }
    }
}
