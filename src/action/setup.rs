// 9.2 action/setup.rs: resolution (uninitialized -> resolved) and sequencing
// (resolved -> sequenced). builders only collect inputs and call `run`.
//
// 9.2.1 resolve: obligation, reserves, authoritative amounts, limits, tier checks
// 9.2.2 sequence: token accounts, bootstrap, refreshes, lending legs, in-between,
//       cleanup, pre/post transactions

use super::core::{Action, ActionRequest, ActionSequencer, ActionState, ResolvedLeg};
use super::kind::{ActionKind, Leg, LegOp, LiquidityFlow};
use super::results::ActionError;
use crate::instruction::{self as ix, Instruction, LendingContext};
use crate::obligation::{ObligationRef, PositionLedger, PositionSide};
use crate::reserve::{FarmMode, ReserveView};
use crate::types::{ActionAmount, Address, Slot, U64_MAX_SENTINEL};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

// reserve + farm + per-obligation farm state of one farm-bearing leg
#[derive(Debug, Clone, Copy)]
struct FarmTarget {
    leg: Leg,
    reserve: Address,
    farm: Address,
    obligation_farm: Address,
    mode: FarmMode,
}

fn push_unique(list: &mut Vec<Address>, address: Address) {
    if !list.contains(&address) {
        list.push(address);
    }
}

impl<'a> ActionSequencer<'a> {
    pub(super) async fn run(&self, request: ActionRequest) -> Result<Action, ActionError> {
        let mut action = self.resolve(&request).await?;
        self.sequence(&mut action, &request).await?;
        Ok(action)
    }

    /// Existence lookups never fail the action. A failed lookup reads as "missing"
    /// and the caller emits an idempotent create.
    pub(super) async fn exists_or_assume_missing(&self, address: &Address, account_kind: &'static str) -> bool {
        match self.reader.account_exists(address).await {
            Ok(exists) => exists,
            Err(err) => {
                warn!(account = %address, account_kind, error = %err, "existence check failed, assuming missing");
                false
            }
        }
    }

    // 9.2.1

    async fn resolve(&self, req: &ActionRequest) -> Result<Action, ActionError> {
        let kind = req.kind;
        let payer = req.options.payer.unwrap_or(req.owner);
        let slot = match req.options.slot {
            Some(slot) => slot,
            None => self.reader.current_slot().await?,
        };
        let mut action = Action::new(kind, req.owner, payer, slot);

        if kind.uses_obligation() {
            let obligation = req.obligation.as_ref().ok_or(ActionError::MissingObligation(kind))?;
            let address = obligation.address(self.deriver, &self.config.programs);
            let (ledger, exists) = match obligation {
                ObligationRef::Resolved(ledger) => (ledger.as_ref().clone(), true),
                ObligationRef::Pending(_) if kind == ActionKind::Liquidate => {
                    return Err(ActionError::ObligationNotResolved(kind));
                }
                ObligationRef::Pending(descriptor) => {
                    if self.exists_or_assume_missing(&address, "obligation").await {
                        let ledger = PositionLedger::load(self.reader, self.decoder, self.market, address).await?;
                        (ledger, true)
                    } else if kind.may_create_obligation() {
                        (PositionLedger::empty(address, descriptor.owner, self.market.address), false)
                    } else {
                        return Err(ActionError::ObligationNotFound(address));
                    }
                }
            };
            action.obligation = Some(address);
            action.obligation_exists = exists;
            action.ledger = Some(ledger);
        }

        for (leg, op) in kind.legs() {
            let (mint, amount) = match leg {
                Leg::Primary => req.primary.ok_or(ActionError::MissingAmount(kind))?,
                Leg::Outflow => req.outflow.ok_or(ActionError::MissingOutflow(kind))?,
            };
            let reserve = Arc::clone(self.market.reserve_by_mint(&mint)?);
            let resolved = self.resolve_leg(kind, action.ledger.as_ref(), slot, &action.owner, *leg, *op, reserve, amount)?;
            action.legs.push(resolved);
        }

        self.check_limits(&action)?;
        action.target_elevation_group = self.resolve_elevation_group(&action, req)?;
        self.check_tiers(&action)?;

        action.state = ActionState::Resolved;
        Ok(action)
    }

    #[allow(clippy::too_many_arguments)]
    fn resolve_leg(
        &self,
        kind: ActionKind,
        ledger: Option<&PositionLedger>,
        slot: Slot,
        owner: &Address,
        leg: Leg,
        op: LegOp,
        reserve: Arc<ReserveView>,
        amount: ActionAmount,
    ) -> Result<ResolvedLeg, ActionError> {
        let (instruction_amount, token_amount, clears_position) = match (op, amount) {
            (op, ActionAmount::Max) if !op.supports_max() => return Err(ActionError::MaxNotSupported(kind)),
            (_, ActionAmount::Exact(0)) => return Err(ActionError::ZeroAmount(kind)),
            (LegOp::Repay, amount) => {
                let ledger = ledger.ok_or(ActionError::MissingObligation(kind))?;
                if ledger.borrow(&reserve.address).is_none() {
                    return Err(ActionError::PositionNotFound {
                        reserve: reserve.address,
                        side: PositionSide::Borrow,
                    });
                }
                // compare against debt compounded to the action's slot, not the stale snapshot
                let debt = ledger.borrowed_amount_at(self.market, &reserve.address, slot)?.to_ceil();
                match amount {
                    ActionAmount::Max => (U64_MAX_SENTINEL, debt, true),
                    ActionAmount::Exact(a) => (a, a, a >= debt),
                }
            }
            (LegOp::Withdraw, amount) => {
                let ledger = ledger.ok_or(ActionError::MissingObligation(kind))?;
                let position = ledger.deposit(&reserve.address).ok_or(ActionError::PositionNotFound {
                    reserve: reserve.address,
                    side: PositionSide::Deposit,
                })?;
                let held = position.amount.to_floor();
                match amount {
                    ActionAmount::Max => (U64_MAX_SENTINEL, held, true),
                    ActionAmount::Exact(a) => (reserve.liquidity_to_collateral(a, slot), a, a >= held),
                }
            }
            (_, ActionAmount::Exact(a)) => (a, a, false),
            (_, ActionAmount::Max) => return Err(ActionError::MaxNotSupported(kind)),
        };

        let programs = &self.config.programs;
        let liquidity_account =
            self.deriver
                .associated_token_account(programs, owner, &reserve.mint(), &reserve.token_program());
        let collateral_account = if op.uses_collateral_account() {
            Some(self.deriver.associated_token_account(programs, owner, &reserve.collateral_mint(), &programs.token))
        } else {
            None
        };

        Ok(ResolvedLeg {
            leg,
            op,
            reserve,
            instruction_amount,
            token_amount,
            clears_position,
            liquidity_account,
            collateral_account,
        })
    }

    fn check_limits(&self, action: &Action) -> Result<(), ActionError> {
        let enforce_caps = self.config.enforce_reserve_caps;
        for leg in &action.legs {
            let reserve = &leg.reserve;
            if leg.op.adds_deposit() {
                if let Some(ledger) = &action.ledger {
                    let max = self.config.max_obligation_deposits;
                    if ledger.deposit(&reserve.address).is_none() && ledger.deposits().len() >= max {
                        return Err(ActionError::DepositSlotsFull { max });
                    }
                }
            }
            if leg.op.adds_borrow() {
                if let Some(ledger) = &action.ledger {
                    let max = self.config.max_obligation_borrows;
                    if ledger.borrow(&reserve.address).is_none() && ledger.borrows().len() >= max {
                        return Err(ActionError::BorrowSlotsFull { max });
                    }
                }
                if enforce_caps && reserve.would_cross_borrow_limit(leg.token_amount) {
                    return Err(ActionError::BorrowCapExceeded {
                        reserve: reserve.address,
                        amount: leg.token_amount,
                    });
                }
            }
            // new liquidity only; collateral-share deposits don't grow supply
            let grows_supply = matches!(leg.op, LegOp::Deposit | LegOp::Mint);
            if enforce_caps && grows_supply && reserve.would_cross_deposit_limit(leg.token_amount) {
                return Err(ActionError::DepositCapExceeded {
                    reserve: reserve.address,
                    amount: leg.token_amount,
                });
            }
        }
        Ok(())
    }

    fn resolve_elevation_group(&self, action: &Action, req: &ActionRequest) -> Result<Option<u8>, ActionError> {
        let current = action.ledger.as_ref().map(|l| l.elevation_group).unwrap_or(0);

        if action.kind == ActionKind::RequestElevationGroup {
            let group = req.elevation_group.unwrap_or(0);
            if group != 0 {
                self.market.elevation_group(group)?;
            }
            return Ok(Some(group));
        }

        if !(req.options.request_elevation_group && action.kind.supports_tier_upgrade()) {
            return Ok(None);
        }
        let reserves: Vec<&ReserveView> = action.legs.iter().map(|l| l.reserve.as_ref()).collect();
        let best = self
            .market
            .best_common_elevation_group(&reserves)
            .map(|g| g.id)
            .unwrap_or(0);
        if best == current {
            debug!(elevation_group = best, "obligation already in best common tier");
            return Ok(None);
        }
        Ok(Some(best))
    }

    fn check_tiers(&self, action: &Action) -> Result<(), ActionError> {
        let ledger = match &action.ledger {
            Some(ledger) => ledger,
            None => return Ok(()),
        };
        let group = action.target_elevation_group.unwrap_or(ledger.elevation_group);
        if group == 0 {
            return Ok(());
        }
        let mismatch = |reserve: &ReserveView| ActionError::TierMismatch {
            reserve: reserve.address,
            elevation_group: group,
        };

        // an explicit tier request must fit everything the obligation already holds
        if action.kind == ActionKind::RequestElevationGroup {
            for address in ledger.touched_reserves() {
                let reserve = self.market.reserve(&address)?;
                if !reserve.supports_elevation_group(group) {
                    return Err(mismatch(&**reserve));
                }
            }
        }
        for leg in action.legs.iter().filter(|l| l.op.checks_tier()) {
            if !leg.reserve.supports_elevation_group(group) {
                return Err(mismatch(leg.reserve.as_ref()));
            }
        }
        Ok(())
    }

    // 9.2.2

    async fn sequence(&self, action: &mut Action, req: &ActionRequest) -> Result<(), ActionError> {
        let programs = &self.config.programs;
        let kind = action.kind;
        let legs = action.legs.clone();
        let obligation = action.obligation.unwrap_or_default();
        let ctx = LendingContext {
            owner: action.owner,
            obligation,
            lending_market: self.market.address,
            market_authority: self.deriver.lending_market_authority(programs, &self.market.address),
        };

        // pool sets
        let (before_deposits, before_borrows) = match &action.ledger {
            Some(ledger) => (ledger.deposit_reserves(), ledger.borrow_reserves()),
            None => (Vec::new(), Vec::new()),
        };
        let mut before_list = before_deposits.clone();
        before_list.extend(before_borrows.iter().copied());

        let mut current = Vec::new();
        for leg in &legs {
            push_unique(&mut current, leg.reserve.address);
        }
        let mut obligation_pools = Vec::new();
        for pool in &before_list {
            push_unique(&mut obligation_pools, *pool);
        }
        let mut others = Vec::new();
        for pool in &obligation_pools {
            if current.contains(pool) {
                debug!(reserve = %pool, "skipping general refresh, action refreshes this pool itself");
            } else {
                others.push(*pool);
            }
        }

        // 9.2.2.1 token accounts, native wrap/unwrap
        let (token_ixs, mut cleanup) = self.token_account_ixs(action, &legs).await;

        // 9.2.2.2 user metadata, referrer state, obligation
        let mut init_ixs = Vec::new();
        if kind.uses_obligation() && !action.obligation_exists {
            let user_metadata = self.deriver.user_metadata(programs, &action.owner);
            if !self.exists_or_assume_missing(&user_metadata, "user metadata").await {
                init_ixs.push(ix::init_user_metadata(programs, &action.owner, &action.payer, &user_metadata));
            }
        }
        let referrer = self.referrer(action, req);
        let mut referrer_states = Vec::new();
        if let Some(referrer) = referrer {
            for leg in legs.iter().filter(|l| l.op == LegOp::Borrow) {
                let state = self.deriver.referrer_token_state(programs, &referrer, &leg.reserve.address);
                if !self.exists_or_assume_missing(&state, "referrer token state").await {
                    init_ixs.push(ix::init_referrer_token_state(
                        programs,
                        &action.payer,
                        &self.market.address,
                        &leg.reserve.address,
                        &referrer,
                        &state,
                    ));
                }
                referrer_states.push((leg.reserve.address, state));
            }
        }
        if kind.uses_obligation() && !action.obligation_exists {
            if let Some(ObligationRef::Pending(descriptor)) = &req.obligation {
                let user_metadata = self.deriver.user_metadata(programs, &action.owner);
                init_ixs.push(ix::init_obligation(
                    programs,
                    &ctx,
                    &action.payer,
                    descriptor.obligation_type.seeds(),
                    &user_metadata,
                    descriptor.obligation_type.tag(),
                    descriptor.id,
                ));
            }
        }

        // 9.2.2.3 farm state bootstrap
        let farms = if kind.uses_obligation() { self.farm_targets(&legs, &obligation) } else { Vec::new() };
        let mut farm_init_ixs = Vec::new();
        for farm in &farms {
            let exists = action.obligation_exists
                && self.exists_or_assume_missing(&farm.obligation_farm, "obligation farm state").await;
            if !exists {
                farm_init_ixs.push(ix::init_obligation_farms_for_reserve(
                    programs,
                    &ctx,
                    &action.payer,
                    &farm.reserve,
                    &farm.farm,
                    &farm.obligation_farm,
                    farm.mode,
                ));
            }
        }

        // 9.2.2.4 reserve refreshes, optional tier change, obligation refresh
        let mut refresh_ixs = self.refresh_reserves(&others, &current)?;
        if let (Some(group), true) = (action.target_elevation_group, kind.supports_tier_upgrade()) {
            info!(obligation = %obligation, elevation_group = group, "inserting elevation group change");
            refresh_ixs.push(ix::refresh_obligation(programs, &self.market.address, &obligation, &before_list));
            refresh_ixs.push(ix::request_elevation_group(programs, &ctx, group, &before_list));
            // tier change invalidates the first round
            refresh_ixs.extend(self.refresh_reserves(&others, &current)?);
        }
        let refreshes_obligation_in_setup = match kind {
            ActionKind::RefreshObligation => false,
            ActionKind::RequestElevationGroup => true,
            _ => legs.iter().any(|l| l.op.needs_obligation_refresh()),
        };
        if refreshes_obligation_in_setup {
            refresh_ixs.push(ix::refresh_obligation(programs, &self.market.address, &obligation, &before_list));
        }

        // 9.2.2.5 farm refreshes: pre for legs executed before the in-between group,
        // post for every leg
        let mut farm_pre_setup = Vec::new();
        let mut farm_pre_in_between = Vec::new();
        for farm in &farms {
            let refresh = ix::refresh_obligation_farms_for_reserve(
                programs,
                &ctx,
                &action.owner,
                &farm.reserve,
                &farm.farm,
                &farm.obligation_farm,
                farm.mode,
            );
            if kind.is_composite() && farm.leg == Leg::Outflow {
                farm_pre_in_between.push(refresh.clone());
            } else {
                farm_pre_setup.push(refresh.clone());
            }
            action.refresh_farms_cleanup.push(refresh);
        }

        // 9.2.2.6 lending
        action.lending = self.lending_ixs(action, req, &legs, &ctx, &before_list, &referrer_states)?;

        // 9.2.2.7 in-between: obligation state after the first leg, plus preloads
        if kind.is_composite() {
            let mut after_deposits = before_deposits.clone();
            let mut after_borrows = before_borrows.clone();
            if let Some(first) = legs.first() {
                let pool = first.reserve.address;
                match first.op {
                    LegOp::Deposit | LegOp::DepositCollateral if !after_deposits.contains(&pool) => {
                        after_deposits.push(pool);
                        action.preloaded_pools.push(pool);
                    }
                    LegOp::Borrow if !after_borrows.contains(&pool) => {
                        after_borrows.push(pool);
                        action.preloaded_pools.push(pool);
                    }
                    // a fully cleared debt stays listed for the second leg
                    LegOp::Repay if first.clears_position => {
                        action.preloaded_pools.push(pool);
                    }
                    _ => {}
                }
            }
            if !action.preloaded_pools.is_empty() {
                debug!(pools = ?action.preloaded_pools, "preloading pools into in-between obligation refresh");
            }
            let mut after_list = after_deposits;
            after_list.extend(after_borrows);
            action
                .in_between
                .push(ix::refresh_obligation(programs, &self.market.address, &obligation, &after_list));
            action.in_between.extend(farm_pre_in_between);
        }

        // 9.2.2.8 assemble setup, maybe split bootstrap into a pre-transaction
        let mut touched: BTreeSet<Address> = obligation_pools.iter().copied().collect();
        touched.extend(current.iter().copied());
        let mut bootstrap = token_ixs;
        let split = action.obligation_exists
            && touched.len() >= self.config.pre_transaction_reserve_threshold
            && !(bootstrap.is_empty() && farm_init_ixs.is_empty());

        let mut setup = Vec::new();
        if let Some(units) = self.config.compute_unit_limit {
            setup.push(ix::set_compute_unit_limit(programs, units));
        }
        if split {
            debug!(touched = touched.len(), "moving account bootstrap to a pre-transaction");
            bootstrap.extend(farm_init_ixs);
            action.pre_transaction = bootstrap;
            setup.extend(init_ixs);
        } else {
            setup.extend(bootstrap);
            setup.extend(init_ixs);
            setup.extend(farm_init_ixs);
        }
        setup.extend(refresh_ixs);
        setup.extend(farm_pre_setup);
        action.setup = setup;

        action.cleanup.append(&mut cleanup);
        action.post_transaction = self.post_transaction_ixs(action, &legs, &ctx, &before_deposits, &before_borrows)?;
        action.current_pools = current;
        action.refreshed_other_pools = others;
        action.state = ActionState::Sequenced;
        Ok(())
    }

    fn referrer(&self, action: &Action, req: &ActionRequest) -> Option<Address> {
        req.options.referrer.or_else(|| {
            action
                .ledger
                .as_ref()
                .map(|l| l.referrer)
                .filter(|r| !r.is_default())
        })
    }

    fn refresh_reserves(&self, others: &[Address], current: &[Address]) -> Result<Vec<Instruction>, ActionError> {
        let programs = &self.config.programs;
        let mut out = Vec::with_capacity(others.len() + current.len());
        for address in others.iter().chain(current.iter()) {
            out.push(ix::refresh_reserve(programs, self.market.reserve(address)?));
        }
        Ok(out)
    }

    fn farm_targets(&self, legs: &[ResolvedLeg], obligation: &Address) -> Vec<FarmTarget> {
        let programs = &self.config.programs;
        legs.iter()
            .filter_map(|leg| {
                let mode = leg.op.farm_mode()?;
                let farm = leg.reserve.farm(mode)?;
                Some(FarmTarget {
                    leg: leg.leg,
                    reserve: leg.reserve.address,
                    farm,
                    obligation_farm: self.deriver.obligation_farm_state(programs, &farm, obligation),
                    mode,
                })
            })
            .collect()
    }

    /// ATA creation for missing accounts, wrap for native inflows, close for native legs.
    async fn token_account_ixs(&self, action: &Action, legs: &[ResolvedLeg]) -> (Vec<Instruction>, Vec<Instruction>) {
        let programs = &self.config.programs;
        let mut needed: Vec<(Address, Address, Address)> = Vec::new();
        for leg in legs {
            if leg.op.liquidity_flow().is_some() && !needed.iter().any(|n| n.0 == leg.liquidity_account) {
                needed.push((leg.liquidity_account, leg.reserve.mint(), leg.reserve.token_program()));
            }
            if let Some(account) = leg.collateral_account {
                if !needed.iter().any(|n| n.0 == account) {
                    needed.push((account, leg.reserve.collateral_mint(), programs.token));
                }
            }
        }

        // both sides of a two-leg action resolve concurrently
        let exists: Vec<bool> = match needed.as_slice() {
            [a, b] => {
                let (x, y) = tokio::join!(
                    self.exists_or_assume_missing(&a.0, "token account"),
                    self.exists_or_assume_missing(&b.0, "token account"),
                );
                vec![x, y]
            }
            _ => {
                let mut out = Vec::with_capacity(needed.len());
                for (account, _, _) in &needed {
                    out.push(self.exists_or_assume_missing(account, "token account").await);
                }
                out
            }
        };

        let mut setup = Vec::new();
        for ((account, mint, token_program), exists) in needed.iter().zip(exists) {
            if !exists {
                setup.push(ix::create_associated_token_account_idempotent(
                    programs,
                    &action.payer,
                    account,
                    &action.owner,
                    mint,
                    token_program,
                ));
            }
        }

        let mut cleanup = Vec::new();
        let mut closed = Vec::new();
        for leg in legs.iter().filter(|l| l.reserve.mint() == programs.native_mint) {
            let flow = match leg.op.liquidity_flow() {
                Some(flow) => flow,
                None => continue,
            };
            if flow == LiquidityFlow::FromUser {
                setup.push(ix::system_transfer(programs, &action.owner, &leg.liquidity_account, leg.token_amount));
                setup.push(ix::sync_native(programs, &leg.liquidity_account));
            }
            if !closed.contains(&leg.liquidity_account) {
                cleanup.push(ix::close_account(programs, &leg.liquidity_account, &action.owner, &action.owner));
                closed.push(leg.liquidity_account);
            }
        }
        (setup, cleanup)
    }

    fn lending_ixs(
        &self,
        action: &Action,
        req: &ActionRequest,
        legs: &[ResolvedLeg],
        ctx: &LendingContext,
        before_list: &[Address],
        referrer_states: &[(Address, Address)],
    ) -> Result<Vec<Instruction>, ActionError> {
        let programs = &self.config.programs;
        let kind = action.kind;
        match kind {
            ActionKind::RefreshObligation => {
                return Ok(vec![ix::refresh_obligation(
                    programs,
                    &self.market.address,
                    &ctx.obligation,
                    before_list,
                )]);
            }
            ActionKind::RequestElevationGroup => {
                let group = action.target_elevation_group.unwrap_or(0);
                return Ok(vec![ix::request_elevation_group(programs, ctx, group, before_list)]);
            }
            _ => {}
        }

        let mut out = Vec::with_capacity(legs.len());
        for leg in legs {
            let reserve = leg.reserve.as_ref();
            let amount = leg.instruction_amount;
            let liquidity = &leg.liquidity_account;
            let collateral = leg.collateral_account.unwrap_or_default();
            let instruction = match leg.op {
                LegOp::Deposit => {
                    ix::deposit_reserve_liquidity_and_obligation_collateral(programs, ctx, reserve, liquidity, amount)
                }
                LegOp::Borrow => {
                    let referrer_state = referrer_states
                        .iter()
                        .find(|(r, _)| *r == reserve.address)
                        .map(|(_, state)| state);
                    ix::borrow_obligation_liquidity(programs, ctx, reserve, liquidity, referrer_state, amount)
                }
                LegOp::Withdraw => ix::withdraw_obligation_collateral_and_redeem_reserve_collateral(
                    programs, ctx, reserve, liquidity, amount,
                ),
                LegOp::Repay => ix::repay_obligation_liquidity(programs, ctx, reserve, liquidity, amount),
                LegOp::Mint => ix::deposit_reserve_liquidity(
                    programs,
                    &ctx.owner,
                    &ctx.market_authority,
                    reserve,
                    liquidity,
                    &collateral,
                    amount,
                ),
                LegOp::Redeem => ix::redeem_reserve_collateral(
                    programs,
                    &ctx.owner,
                    &ctx.market_authority,
                    reserve,
                    liquidity,
                    &collateral,
                    amount,
                ),
                LegOp::DepositCollateral => {
                    ix::deposit_obligation_collateral(programs, ctx, reserve, &collateral, amount)
                }
                LegOp::LiquidateRepay => {
                    let withdraw = legs
                        .iter()
                        .find(|l| l.op == LegOp::LiquidateWithdraw)
                        .ok_or(ActionError::MissingOutflow(kind))?;
                    ix::liquidate_obligation_and_redeem_reserve_collateral(
                        programs,
                        ctx,
                        reserve,
                        &withdraw.reserve,
                        liquidity,
                        &withdraw.liquidity_account,
                        amount,
                        req.min_received,
                        req.max_ltv_override_pct,
                    )
                }
                // emitted together with the repay side
                LegOp::LiquidateWithdraw => continue,
                LegOp::ReferrerFees => {
                    let state = self
                        .deriver
                        .referrer_token_state(programs, &ctx.owner, &reserve.address);
                    ix::withdraw_referrer_fees(programs, &ctx.owner, &state, reserve, &ctx.market_authority, liquidity)
                }
            };
            out.push(instruction);
        }
        Ok(out)
    }

    /// After repaying every debt of an obligation in a non-neutral tier, drop it back to tier 0.
    fn post_transaction_ixs(
        &self,
        action: &Action,
        legs: &[ResolvedLeg],
        ctx: &LendingContext,
        before_deposits: &[Address],
        before_borrows: &[Address],
    ) -> Result<Vec<Instruction>, ActionError> {
        let programs = &self.config.programs;
        let ledger = match &action.ledger {
            Some(ledger) => ledger,
            None => return Ok(Vec::new()),
        };
        if !self.config.reset_elevation_group_after_full_repay || ledger.elevation_group == 0 {
            return Ok(Vec::new());
        }
        let cleared: Vec<Address> = legs
            .iter()
            .filter(|l| l.op == LegOp::Repay && l.clears_position)
            .map(|l| l.reserve.address)
            .collect();
        if cleared.is_empty() || !before_borrows.iter().all(|b| cleared.contains(b)) {
            return Ok(Vec::new());
        }

        let emptied: Vec<Address> = legs
            .iter()
            .filter(|l| l.op == LegOp::Withdraw && l.clears_position)
            .map(|l| l.reserve.address)
            .collect();
        let remaining: Vec<Address> = before_deposits
            .iter()
            .copied()
            .filter(|d| !emptied.contains(d))
            .collect();

        info!(obligation = %ctx.obligation, "debt fully repaid, resetting elevation group");
        let mut out = self.refresh_reserves(&remaining, &[])?;
        out.push(ix::refresh_obligation(programs, &self.market.address, &ctx.obligation, &remaining));
        out.push(ix::request_elevation_group(programs, ctx, 0, &remaining));
        Ok(out)
    }
}
