// shared builders for unit tests

use crate::fraction::Fraction;
use crate::integration::{OracleConfig, OraclePrice};
use crate::interest::BorrowRateCurve;
use crate::market::{ElevationGroup, LendingMarketState, MarketView};
use crate::reserve::{ReserveCollateral, ReserveConfig, ReserveLiquidity, ReserveState, ReserveView};
use crate::types::{Address, Timestamp};
use rust_decimal::Decimal;

pub const LIQUIDITY_TOKENS: u64 = 1_000_000;

/// Reserve holding `LIQUIDITY_TOKENS` whole tokens, nothing borrowed, exchange rate 1.
pub fn reserve_view(symbol: &str, ltv: u8, liq_threshold: u8, price: u64, decimals: u8) -> ReserveView {
    let available = LIQUIDITY_TOKENS * 10u64.pow(decimals as u32);
    let state = ReserveState {
        last_update_slot: 0,
        liquidity: ReserveLiquidity {
            mint: Address::new_unique(),
            mint_decimals: decimals,
            supply_vault: Address::new_unique(),
            fee_vault: Address::new_unique(),
            token_program: crate::config::TOKEN_PROGRAM_ID,
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
    };
    ReserveView::new(
        Address::new_unique(),
        state,
        Some(OraclePrice::fresh(Decimal::from(price), Timestamp::now())),
    )
}

pub fn group(id: u8, ltv: u8, liq_threshold: u8) -> ElevationGroup {
    ElevationGroup {
        id,
        ltv_pct: ltv,
        liquidation_threshold_pct: liq_threshold,
        max_liquidation_bonus_bps: 200,
        allow_new_loans: true,
    }
}

pub fn market_with(reserves: Vec<ReserveView>, groups: Vec<ElevationGroup>) -> MarketView {
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
