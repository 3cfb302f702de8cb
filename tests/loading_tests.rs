//! Market and obligation loading through the ledger, decoder and oracle contracts.

mod common;

use common::*;
use lend_core::*;
use rust_decimal_macros::dec;

struct Fixture {
    ledger: MockLedger,
    oracle: MockOracle,
    market: Address,
    priced: Address,
    unpriced: Address,
    foreign: Address,
    priced_mint: Address,
}

fn fixture() -> Fixture {
    let mut ledger = MockLedger::new();
    let mut oracle = MockOracle::default();
    let market = Address::new_unique();
    ledger.put(
        market,
        DecodedAccount::LendingMarket(LendingMarketState {
            owner: Address::new_unique(),
            quote_currency: "USD".to_string(),
            referral_fee_bps: 50,
            elevation_groups: vec![elevation_group(1, 90, 95)],
        }),
    );

    let priced_mint = Address::new_unique();
    let mut priced = reserve_state("USDC", 75, 85, 6, priced_mint);
    priced.lending_market = market;
    let mut unpriced = reserve_state("BONK", 0, 0, 5, Address::new_unique());
    unpriced.lending_market = market;
    unpriced.config.oracle = None;
    let mut foreign = reserve_state("ETH", 70, 80, 8, Address::new_unique());
    foreign.lending_market = Address::new_unique();

    let (p, u, f) = (Address::new_unique(), Address::new_unique(), Address::new_unique());
    ledger.put(p, DecodedAccount::Reserve(Box::new(priced)));
    ledger.put(u, DecodedAccount::Reserve(Box::new(unpriced)));
    ledger.put(f, DecodedAccount::Reserve(Box::new(foreign)));
    ledger.market_reserves.insert(market, vec![p, u, f]);
    oracle
        .prices
        .insert(priced_mint, OraclePrice::fresh(dec!(1.0001), Timestamp::now()));

    Fixture {
        ledger,
        oracle,
        market,
        priced: p,
        unpriced: u,
        foreign: f,
        priced_mint,
    }
}

fn config() -> SequencerConfig {
    SequencerConfig::new(programs())
}

#[tokio::test]
async fn market_load_attaches_prices() {
    let f = fixture();
    let market = MarketView::load(&f.ledger, &f.ledger, &f.oracle, f.market, &config()).await.unwrap();

    assert_eq!(market.reserve_count(), 2);
    assert!(market.get_reserve(&f.foreign).is_none());
    assert_eq!(market.state.referral_fee_bps, 50);

    let priced = market.reserve(&f.priced).unwrap();
    assert_eq!(priced.price().map(|p| p.price), Some(dec!(1.0001)));
    assert_eq!(market.reserve_by_mint(&f.priced_mint).unwrap().address, f.priced);

    let unpriced = market.reserve(&f.unpriced).unwrap();
    assert!(unpriced.price().is_none());
    assert_eq!(unpriced.oracle_price().unwrap_err().kind(), ErrorKind::Configuration);
}

#[tokio::test]
async fn stale_price_is_flagged() {
    let mut f = fixture();
    let old = Timestamp::from_secs(Timestamp::now().as_secs() - 3_600);
    f.oracle.prices.insert(f.priced_mint, OraclePrice::fresh(dec!(1), old));

    let market = MarketView::load(&f.ledger, &f.ledger, &f.oracle, f.market, &config()).await.unwrap();
    let price = market.reserve(&f.priced).unwrap().price().copied().unwrap();
    assert!(price.is_stale);
}

#[tokio::test]
async fn market_load_errors() {
    let f = fixture();
    let err = MarketView::load(&f.ledger, &f.ledger, &f.oracle, Address::new_unique(), &config())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let mut f = fixture();
    f.oracle.prices.clear();
    let err = MarketView::load(&f.ledger, &f.ledger, &f.oracle, f.market, &config())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);

    let mut f = fixture();
    f.ledger.fail(f.market);
    let err = MarketView::load(&f.ledger, &f.ledger, &f.oracle, f.market, &config())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::External);
}

#[tokio::test]
async fn oversized_mint_decimals_fail_load() {
    let mut f = fixture();
    let mut wide = reserve_state("WIDE", 50, 60, 20, Address::new_unique());
    wide.lending_market = f.market;
    let address = Address::new_unique();
    f.ledger.put(address, DecodedAccount::Reserve(Box::new(wide)));
    f.ledger.market_reserves.get_mut(&f.market).unwrap().push(address);

    let err = MarketView::load(&f.ledger, &f.ledger, &f.oracle, f.market, &config())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert!(matches!(
        err,
        MarketError::Reserve(ReserveError::UnsupportedDecimals { decimals: 20, .. })
    ));
}

#[tokio::test]
async fn reserve_refresh_replaces_cache_entry() {
    let mut f = fixture();
    let cfg = config();
    let mut market = MarketView::load(&f.ledger, &f.ledger, &f.oracle, f.market, &cfg).await.unwrap();

    let mut updated = reserve_state("USDC", 75, 85, 6, f.priced_mint);
    updated.lending_market = f.market;
    updated.liquidity.available_amount = 42;
    f.ledger.put(f.priced, DecodedAccount::Reserve(Box::new(updated)));

    let view = market
        .refresh_reserve(&f.ledger, &f.ledger, &f.oracle, &f.priced, &cfg)
        .await
        .unwrap();
    assert_eq!(view.available_amount(), Fraction::from_num(42));
    assert_eq!(market.reserve(&f.priced).unwrap().available_amount(), Fraction::from_num(42));
}

#[tokio::test]
async fn obligation_loads_from_ledger() {
    let f = fixture();
    let market = MarketView::load(&f.ledger, &f.ledger, &f.oracle, f.market, &config()).await.unwrap();
    let mut ledger = f.ledger;
    let owner = Address::new_unique();
    let record = obligation_record(&market, owner, &[(f.priced, 250_000_000)], &[], 0);
    let address = Address::new_unique();
    ledger.put(address, DecodedAccount::Obligation(Box::new(record)));

    let position = PositionLedger::load(&ledger, &ledger, &market, address).await.unwrap();
    assert_eq!(position.owner, owner);
    assert_eq!(position.slot, SLOT);
    assert_eq!(position.deposit_reserves(), vec![f.priced]);
    assert!(!position.has_debt());

    let missing = Address::new_unique();
    let many = PositionLedger::load_many(&ledger, &ledger, &market, &[address, missing]).await.unwrap();
    assert!(many[0].is_some());
    assert!(many[1].is_none());

    let err = PositionLedger::load(&ledger, &ledger, &market, missing).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    // wrong record kind behind the address
    let err = PositionLedger::load(&ledger, &ledger, &market, f.market).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::External);
}

#[tokio::test]
async fn pending_obligation_that_exists_is_loaded() {
    let f = fixture();
    let market = MarketView::load(&f.ledger, &f.ledger, &f.oracle, f.market, &config()).await.unwrap();
    let mut ledger = f.ledger;
    let programs = programs();
    let owner = Address::new_unique();
    let obligation = pending(owner, &market);
    let address = obligation.address(&HashDeriver, &programs);
    let record = obligation_record(&market, owner, &[(f.priced, 250_000_000)], &[], 0);
    ledger.put(address, DecodedAccount::Obligation(Box::new(record)));

    let sequencer = ActionSequencer::new(&market, &ledger, &ledger, &HashDeriver, SequencerConfig::new(programs))
        .unwrap_or_else(|e| panic!("{}", e));
    let action = sequencer
        .build_withdraw_txns(f.priced_mint, ActionAmount::Max, obligation, &ActionOptions::default())
        .await
        .unwrap();

    assert!(action.obligation_exists());
    assert_eq!(action.ledger().map(|l| l.deposit_reserves()), Some(vec![f.priced]));
    let leg = &action.legs()[0];
    assert_eq!(leg.instruction_amount, u64::MAX);
    assert_eq!(leg.token_amount, 250_000_000);
    assert!(leg.clears_position);
    assert_eq!(count(action.setup_ixs(), "init_obligation"), 0);
}
