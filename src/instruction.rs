// 7.0 instruction.rs: typed ledger instructions. no wire encoding lives here, the
// submission side serializes them. builders fill in the account lists the lending
// program and token programs expect, in their order.

use crate::config::ProgramIds;
use crate::reserve::{FarmMode, ReserveView};
use crate::types::Address;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountMeta {
    pub address: Address,
    pub is_signer: bool,
    pub is_writable: bool,
}

impl AccountMeta {
    pub fn writable(address: Address, is_signer: bool) -> Self {
        Self { address, is_signer, is_writable: true }
    }

    pub fn readonly(address: Address, is_signer: bool) -> Self {
        Self { address, is_signer, is_writable: false }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstructionKind {
    // 7.1 bootstrap
    InitUserMetadata,
    InitObligation { tag: u8, id: u8 },
    InitObligationFarmsForReserve { mode: FarmMode },
    InitReferrerTokenState,

    // 7.2 refresh
    RefreshReserve,
    RefreshObligation,
    RefreshObligationFarmsForReserve { mode: FarmMode },
    RequestElevationGroup { elevation_group: u8 },

    // 7.3 lending
    DepositReserveLiquidity { liquidity_amount: u64 },
    RedeemReserveCollateral { collateral_amount: u64 },
    DepositReserveLiquidityAndObligationCollateral { liquidity_amount: u64 },
    DepositObligationCollateral { collateral_amount: u64 },
    BorrowObligationLiquidity { liquidity_amount: u64 },
    WithdrawObligationCollateralAndRedeemReserveCollateral { collateral_amount: u64 },
    RepayObligationLiquidity { liquidity_amount: u64 },
    LiquidateObligationAndRedeemReserveCollateral {
        liquidity_amount: u64,
        min_acceptable_received_liquidity_amount: u64,
        max_allowed_ltv_override_percent: u64,
    },
    WithdrawReferrerFees,

    // 7.4 token plumbing
    CreateAssociatedTokenAccountIdempotent,
    SystemTransfer { lamports: u64 },
    SyncNative,
    CloseAccount,
    SetComputeUnitLimit { units: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    pub program_id: Address,
    pub kind: InstructionKind,
    pub accounts: Vec<AccountMeta>,
}

impl Instruction {
    pub fn name(&self) -> &'static str {
        match self.kind {
            InstructionKind::InitUserMetadata => "init_user_metadata",
            InstructionKind::InitObligation { .. } => "init_obligation",
            InstructionKind::InitObligationFarmsForReserve { .. } => "init_obligation_farms_for_reserve",
            InstructionKind::InitReferrerTokenState => "init_referrer_token_state",
            InstructionKind::RefreshReserve => "refresh_reserve",
            InstructionKind::RefreshObligation => "refresh_obligation",
            InstructionKind::RefreshObligationFarmsForReserve { .. } => "refresh_obligation_farms_for_reserve",
            InstructionKind::RequestElevationGroup { .. } => "request_elevation_group",
            InstructionKind::DepositReserveLiquidity { .. } => "deposit_reserve_liquidity",
            InstructionKind::RedeemReserveCollateral { .. } => "redeem_reserve_collateral",
            InstructionKind::DepositReserveLiquidityAndObligationCollateral { .. } => {
                "deposit_reserve_liquidity_and_obligation_collateral"
            }
            InstructionKind::DepositObligationCollateral { .. } => "deposit_obligation_collateral",
            InstructionKind::BorrowObligationLiquidity { .. } => "borrow_obligation_liquidity",
            InstructionKind::WithdrawObligationCollateralAndRedeemReserveCollateral { .. } => {
                "withdraw_obligation_collateral_and_redeem_reserve_collateral"
            }
            InstructionKind::RepayObligationLiquidity { .. } => "repay_obligation_liquidity",
            InstructionKind::LiquidateObligationAndRedeemReserveCollateral { .. } => {
                "liquidate_obligation_and_redeem_reserve_collateral"
            }
            InstructionKind::WithdrawReferrerFees => "withdraw_referrer_fees",
            InstructionKind::CreateAssociatedTokenAccountIdempotent => "create_associated_token_account_idempotent",
            InstructionKind::SystemTransfer { .. } => "system_transfer",
            InstructionKind::SyncNative => "sync_native",
            InstructionKind::CloseAccount => "close_account",
            InstructionKind::SetComputeUnitLimit { .. } => "set_compute_unit_limit",
        }
    }

    /// Reserve list carried by a refresh-obligation instruction, in order.
    pub fn refreshed_obligation_reserves(&self) -> Option<Vec<Address>> {
        match self.kind {
            InstructionKind::RefreshObligation => {
                Some(self.accounts.iter().skip(2).map(|a| a.address).collect())
            }
            _ => None,
        }
    }

    /// Reserve a refresh-reserve instruction targets.
    pub fn refreshed_reserve(&self) -> Option<Address> {
        match self.kind {
            InstructionKind::RefreshReserve => self.accounts.first().map(|a| a.address),
            _ => None,
        }
    }

    pub fn is_lending(&self) -> bool {
        matches!(
            self.kind,
            InstructionKind::DepositReserveLiquidity { .. }
                | InstructionKind::RedeemReserveCollateral { .. }
                | InstructionKind::DepositReserveLiquidityAndObligationCollateral { .. }
                | InstructionKind::DepositObligationCollateral { .. }
                | InstructionKind::BorrowObligationLiquidity { .. }
                | InstructionKind::WithdrawObligationCollateralAndRedeemReserveCollateral { .. }
                | InstructionKind::RepayObligationLiquidity { .. }
                | InstructionKind::LiquidateObligationAndRedeemReserveCollateral { .. }
                | InstructionKind::WithdrawReferrerFees
        )
    }

    /// Signer addresses, deduplicated, in account order.
    pub fn signers(&self) -> Vec<Address> {
        let mut out: Vec<Address> = Vec::new();
        for meta in self.accounts.iter().filter(|a| a.is_signer) {
            if !out.contains(&meta.address) {
                out.push(meta.address);
            }
        }
        out
    }
}

/// Accounts shared by every obligation-scoped lending instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LendingContext {
    pub owner: Address,
    pub obligation: Address,
    pub lending_market: Address,
    pub market_authority: Address,
}

fn lending_ix(programs: &ProgramIds, kind: InstructionKind, accounts: Vec<AccountMeta>) -> Instruction {
    Instruction {
        program_id: programs.lending,
        kind,
        accounts,
    }
}

// 7.1 bootstrap

pub fn init_user_metadata(programs: &ProgramIds, owner: &Address, payer: &Address, user_metadata: &Address) -> Instruction {
    lending_ix(
        programs,
        InstructionKind::InitUserMetadata,
        vec![
            AccountMeta::readonly(*owner, true),
            AccountMeta::writable(*payer, true),
            AccountMeta::writable(*user_metadata, false),
            AccountMeta::readonly(programs.system, false),
        ],
    )
}

pub fn init_obligation(
    programs: &ProgramIds,
    ctx: &LendingContext,
    payer: &Address,
    seeds: (Address, Address),
    user_metadata: &Address,
    tag: u8,
    id: u8,
) -> Instruction {
    lending_ix(
        programs,
        InstructionKind::InitObligation { tag, id },
        vec![
            AccountMeta::readonly(ctx.owner, true),
            AccountMeta::writable(*payer, true),
            AccountMeta::writable(ctx.obligation, false),
            AccountMeta::readonly(ctx.lending_market, false),
            AccountMeta::readonly(seeds.0, false),
            AccountMeta::readonly(seeds.1, false),
            AccountMeta::readonly(*user_metadata, false),
            AccountMeta::readonly(programs.system, false),
        ],
    )
}

pub fn init_obligation_farms_for_reserve(
    programs: &ProgramIds,
    ctx: &LendingContext,
    payer: &Address,
    reserve: &Address,
    farm: &Address,
    obligation_farm: &Address,
    mode: FarmMode,
) -> Instruction {
    lending_ix(
        programs,
        InstructionKind::InitObligationFarmsForReserve { mode },
        vec![
            AccountMeta::writable(*payer, true),
            AccountMeta::readonly(ctx.owner, false),
            AccountMeta::writable(ctx.obligation, false),
            AccountMeta::readonly(ctx.market_authority, false),
            AccountMeta::writable(*reserve, false),
            AccountMeta::writable(*farm, false),
            AccountMeta::writable(*obligation_farm, false),
            AccountMeta::readonly(ctx.lending_market, false),
            AccountMeta::readonly(programs.farms, false),
            AccountMeta::readonly(programs.system, false),
        ],
    )
}

pub fn init_referrer_token_state(
    programs: &ProgramIds,
    payer: &Address,
    lending_market: &Address,
    reserve: &Address,
    referrer: &Address,
    referrer_token_state: &Address,
) -> Instruction {
    lending_ix(
        programs,
        InstructionKind::InitReferrerTokenState,
        vec![
            AccountMeta::writable(*payer, true),
            AccountMeta::readonly(*lending_market, false),
            AccountMeta::readonly(*reserve, false),
            AccountMeta::readonly(*referrer, false),
            AccountMeta::writable(*referrer_token_state, false),
            AccountMeta::readonly(programs.system, false),
        ],
    )
}

// 7.2 refresh

pub fn refresh_reserve(programs: &ProgramIds, reserve: &ReserveView) -> Instruction {
    let mut accounts = vec![
        AccountMeta::writable(reserve.address, false),
        AccountMeta::readonly(reserve.state.lending_market, false),
    ];
    if let Some(oracle) = &reserve.state.config.oracle {
        accounts.push(AccountMeta::readonly(oracle.price_feed, false));
        if let Some(twap) = oracle.twap_feed {
            accounts.push(AccountMeta::readonly(twap, false));
        }
    }
    lending_ix(programs, InstructionKind::RefreshReserve, accounts)
}

/// The reserve list must be deposits first, then borrows, both in slot order.
pub fn refresh_obligation(programs: &ProgramIds, lending_market: &Address, obligation: &Address, reserves: &[Address]) -> Instruction {
    let mut accounts = vec![
        AccountMeta::readonly(*lending_market, false),
        AccountMeta::writable(*obligation, false),
    ];
    accounts.extend(reserves.iter().map(|r| AccountMeta::readonly(*r, false)));
    lending_ix(programs, InstructionKind::RefreshObligation, accounts)
}

pub fn refresh_obligation_farms_for_reserve(
    programs: &ProgramIds,
    ctx: &LendingContext,
    crank: &Address,
    reserve: &Address,
    farm: &Address,
    obligation_farm: &Address,
    mode: FarmMode,
) -> Instruction {
    lending_ix(
        programs,
        InstructionKind::RefreshObligationFarmsForReserve { mode },
        vec![
            AccountMeta::readonly(*crank, true),
            AccountMeta::readonly(ctx.obligation, false),
            AccountMeta::readonly(ctx.market_authority, false),
            AccountMeta::readonly(*reserve, false),
            AccountMeta::writable(*farm, false),
            AccountMeta::writable(*obligation_farm, false),
            AccountMeta::readonly(ctx.lending_market, false),
            AccountMeta::readonly(programs.farms, false),
        ],
    )
}

pub fn request_elevation_group(programs: &ProgramIds, ctx: &LendingContext, elevation_group: u8, reserves: &[Address]) -> Instruction {
    let mut accounts = vec![
        AccountMeta::readonly(ctx.owner, true),
        AccountMeta::writable(ctx.obligation, false),
        AccountMeta::readonly(ctx.lending_market, false),
    ];
    accounts.extend(reserves.iter().map(|r| AccountMeta::readonly(*r, false)));
    lending_ix(programs, InstructionKind::RequestElevationGroup { elevation_group }, accounts)
}

// 7.3 lending

fn reserve_liquidity_accounts(reserve: &ReserveView, user_liquidity: &Address) -> Vec<AccountMeta> {
    vec![
        AccountMeta::writable(reserve.address, false),
        AccountMeta::readonly(reserve.mint(), false),
        AccountMeta::writable(reserve.state.liquidity.supply_vault, false),
        AccountMeta::writable(reserve.collateral_mint(), false),
        AccountMeta::writable(*user_liquidity, false),
        AccountMeta::readonly(reserve.token_program(), false),
    ]
}

/// Mint collateral shares without touching an obligation.
pub fn deposit_reserve_liquidity(
    programs: &ProgramIds,
    owner: &Address,
    market_authority: &Address,
    reserve: &ReserveView,
    user_liquidity: &Address,
    user_collateral: &Address,
    liquidity_amount: u64,
) -> Instruction {
    let mut accounts = vec![
        AccountMeta::readonly(*owner, true),
        AccountMeta::readonly(reserve.state.lending_market, false),
        AccountMeta::readonly(*market_authority, false),
    ];
    accounts.extend(reserve_liquidity_accounts(reserve, user_liquidity));
    accounts.push(AccountMeta::writable(*user_collateral, false));
    lending_ix(programs, InstructionKind::DepositReserveLiquidity { liquidity_amount }, accounts)
}

pub fn redeem_reserve_collateral(
    programs: &ProgramIds,
    owner: &Address,
    market_authority: &Address,
    reserve: &ReserveView,
    user_liquidity: &Address,
    user_collateral: &Address,
    collateral_amount: u64,
) -> Instruction {
    let mut accounts = vec![
        AccountMeta::readonly(*owner, true),
        AccountMeta::readonly(reserve.state.lending_market, false),
        AccountMeta::readonly(*market_authority, false),
    ];
    accounts.extend(reserve_liquidity_accounts(reserve, user_liquidity));
    accounts.push(AccountMeta::writable(*user_collateral, false));
    lending_ix(programs, InstructionKind::RedeemReserveCollateral { collateral_amount }, accounts)
}

fn obligation_accounts(ctx: &LendingContext) -> Vec<AccountMeta> {
    vec![
        AccountMeta::readonly(ctx.owner, true),
        AccountMeta::writable(ctx.obligation, false),
        AccountMeta::readonly(ctx.lending_market, false),
        AccountMeta::readonly(ctx.market_authority, false),
    ]
}

pub fn deposit_reserve_liquidity_and_obligation_collateral(
    programs: &ProgramIds,
    ctx: &LendingContext,
    reserve: &ReserveView,
    user_liquidity: &Address,
    liquidity_amount: u64,
) -> Instruction {
    let mut accounts = obligation_accounts(ctx);
    accounts.extend(reserve_liquidity_accounts(reserve, user_liquidity));
    accounts.push(AccountMeta::writable(reserve.state.collateral.supply_vault, false));
    lending_ix(
        programs,
        InstructionKind::DepositReserveLiquidityAndObligationCollateral { liquidity_amount },
        accounts,
    )
}

pub fn deposit_obligation_collateral(
    programs: &ProgramIds,
    ctx: &LendingContext,
    reserve: &ReserveView,
    user_collateral: &Address,
    collateral_amount: u64,
) -> Instruction {
    let mut accounts = obligation_accounts(ctx);
    accounts.extend([
        AccountMeta::writable(reserve.address, false),
        AccountMeta::writable(reserve.state.collateral.supply_vault, false),
        AccountMeta::writable(*user_collateral, false),
        AccountMeta::readonly(programs.token, false),
    ]);
    lending_ix(programs, InstructionKind::DepositObligationCollateral { collateral_amount }, accounts)
}

pub fn borrow_obligation_liquidity(
    programs: &ProgramIds,
    ctx: &LendingContext,
    reserve: &ReserveView,
    user_liquidity: &Address,
    referrer_token_state: Option<&Address>,
    liquidity_amount: u64,
) -> Instruction {
    let mut accounts = obligation_accounts(ctx);
    accounts.extend([
        AccountMeta::writable(reserve.address, false),
        AccountMeta::readonly(reserve.mint(), false),
        AccountMeta::writable(reserve.state.liquidity.supply_vault, false),
        AccountMeta::writable(reserve.state.liquidity.fee_vault, false),
        AccountMeta::writable(*user_liquidity, false),
        // program id stands in for "no referrer"
        AccountMeta::writable(referrer_token_state.copied().unwrap_or(programs.lending), false),
        AccountMeta::readonly(reserve.token_program(), false),
    ]);
    lending_ix(programs, InstructionKind::BorrowObligationLiquidity { liquidity_amount }, accounts)
}

pub fn withdraw_obligation_collateral_and_redeem_reserve_collateral(
    programs: &ProgramIds,
    ctx: &LendingContext,
    reserve: &ReserveView,
    user_liquidity: &Address,
    collateral_amount: u64,
) -> Instruction {
    let mut accounts = obligation_accounts(ctx);
    accounts.push(AccountMeta::writable(reserve.state.collateral.supply_vault, false));
    accounts.extend(reserve_liquidity_accounts(reserve, user_liquidity));
    lending_ix(
        programs,
        InstructionKind::WithdrawObligationCollateralAndRedeemReserveCollateral { collateral_amount },
        accounts,
    )
}

pub fn repay_obligation_liquidity(
    programs: &ProgramIds,
    ctx: &LendingContext,
    reserve: &ReserveView,
    user_liquidity: &Address,
    liquidity_amount: u64,
) -> Instruction {
    let mut accounts = obligation_accounts(ctx);
    accounts.extend([
        AccountMeta::writable(reserve.address, false),
        AccountMeta::readonly(reserve.mint(), false),
        AccountMeta::writable(reserve.state.liquidity.supply_vault, false),
        AccountMeta::writable(*user_liquidity, false),
        AccountMeta::readonly(reserve.token_program(), false),
    ]);
    lending_ix(programs, InstructionKind::RepayObligationLiquidity { liquidity_amount }, accounts)
}

/// `ctx.owner` is the liquidator here, `ctx.obligation` the unhealthy position.
#[allow(clippy::too_many_arguments)]
pub fn liquidate_obligation_and_redeem_reserve_collateral(
    programs: &ProgramIds,
    ctx: &LendingContext,
    repay_reserve: &ReserveView,
    withdraw_reserve: &ReserveView,
    liquidator_repay_account: &Address,
    liquidator_withdraw_account: &Address,
    liquidity_amount: u64,
    min_acceptable_received_liquidity_amount: u64,
    max_allowed_ltv_override_percent: u64,
) -> Instruction {
    let mut accounts = obligation_accounts(ctx);
    accounts.extend([
        AccountMeta::writable(repay_reserve.address, false),
        AccountMeta::readonly(repay_reserve.mint(), false),
        AccountMeta::writable(repay_reserve.state.liquidity.supply_vault, false),
        AccountMeta::writable(withdraw_reserve.address, false),
        AccountMeta::readonly(withdraw_reserve.mint(), false),
        AccountMeta::writable(withdraw_reserve.collateral_mint(), false),
        AccountMeta::writable(withdraw_reserve.state.collateral.supply_vault, false),
        AccountMeta::writable(withdraw_reserve.state.liquidity.supply_vault, false),
        AccountMeta::writable(withdraw_reserve.state.liquidity.fee_vault, false),
        AccountMeta::writable(*liquidator_repay_account, false),
        AccountMeta::writable(*liquidator_withdraw_account, false),
        AccountMeta::readonly(repay_reserve.token_program(), false),
        AccountMeta::readonly(withdraw_reserve.token_program(), false),
    ]);
    lending_ix(
        programs,
        InstructionKind::LiquidateObligationAndRedeemReserveCollateral {
            liquidity_amount,
            min_acceptable_received_liquidity_amount,
            max_allowed_ltv_override_percent,
        },
        accounts,
    )
}

pub fn withdraw_referrer_fees(
    programs: &ProgramIds,
    referrer: &Address,
    referrer_token_state: &Address,
    reserve: &ReserveView,
    market_authority: &Address,
    referrer_token_account: &Address,
) -> Instruction {
    lending_ix(
        programs,
        InstructionKind::WithdrawReferrerFees,
        vec![
            AccountMeta::writable(*referrer, true),
            AccountMeta::writable(*referrer_token_state, false),
            AccountMeta::writable(reserve.address, false),
            AccountMeta::readonly(reserve.mint(), false),
            AccountMeta::writable(reserve.state.liquidity.supply_vault, false),
            AccountMeta::writable(*referrer_token_account, false),
            AccountMeta::readonly(reserve.state.lending_market, false),
            AccountMeta::readonly(*market_authority, false),
            AccountMeta::readonly(reserve.token_program(), false),
        ],
    )
}

// 7.4 token plumbing

pub fn create_associated_token_account_idempotent(
    programs: &ProgramIds,
    payer: &Address,
    account: &Address,
    owner: &Address,
    mint: &Address,
    token_program: &Address,
) -> Instruction {
    Instruction {
        program_id: programs.associated_token,
        kind: InstructionKind::CreateAssociatedTokenAccountIdempotent,
        accounts: vec![
            AccountMeta::writable(*payer, true),
            AccountMeta::writable(*account, false),
            AccountMeta::readonly(*owner, false),
            AccountMeta::readonly(*mint, false),
            AccountMeta::readonly(programs.system, false),
            AccountMeta::readonly(*token_program, false),
        ],
    }
}

pub fn system_transfer(programs: &ProgramIds, from: &Address, to: &Address, lamports: u64) -> Instruction {
    Instruction {
        program_id: programs.system,
        kind: InstructionKind::SystemTransfer { lamports },
        accounts: vec![AccountMeta::writable(*from, true), AccountMeta::writable(*to, false)],
    }
}

pub fn sync_native(programs: &ProgramIds, account: &Address) -> Instruction {
    Instruction {
        program_id: programs.token,
        kind: InstructionKind::SyncNative,
        accounts: vec![AccountMeta::writable(*account, false)],
    }
}

pub fn close_account(programs: &ProgramIds, account: &Address, destination: &Address, owner: &Address) -> Instruction {
    Instruction {
        program_id: programs.token,
        kind: InstructionKind::CloseAccount,
        accounts: vec![
            AccountMeta::writable(*account, false),
            AccountMeta::writable(*destination, false),
            AccountMeta::readonly(*owner, true),
        ],
    }
}

pub fn set_compute_unit_limit(programs: &ProgramIds, units: u32) -> Instruction {
    Instruction {
        program_id: programs.compute_budget,
        kind: InstructionKind::SetComputeUnitLimit { units },
        accounts: vec![],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::reserve_view;

    fn programs() -> ProgramIds {
        ProgramIds::new(Address::new_unique(), Address::new_unique())
    }

    #[test]
    fn refresh_obligation_keeps_reserve_order() {
        let p = programs();
        let (market, obligation) = (Address::new_unique(), Address::new_unique());
        let reserves = vec![Address::new_unique(), Address::new_unique(), Address::new_unique()];
        let ix = refresh_obligation(&p, &market, &obligation, &reserves);
        assert_eq!(ix.program_id, p.lending);
        assert_eq!(ix.name(), "refresh_obligation");
        assert_eq!(ix.refreshed_obligation_reserves(), Some(reserves));
        assert_eq!(ix.refreshed_reserve(), None);
    }

    #[test]
    fn refresh_reserve_carries_oracle_accounts() {
        let p = programs();
        let reserve = reserve_view("USDC", 75, 85, 1, 6);
        let ix = refresh_reserve(&p, &reserve);
        assert_eq!(ix.refreshed_reserve(), Some(reserve.address));
        assert_eq!(ix.accounts.len(), 3);
        assert!(!ix.is_lending());
    }

    #[test]
    fn borrow_without_referrer_uses_program_placeholder() {
        let p = programs();
        let reserve = reserve_view("USDC", 75, 85, 1, 6);
        let ctx = LendingContext {
            owner: Address::new_unique(),
            obligation: Address::new_unique(),
            lending_market: reserve.state.lending_market,
            market_authority: Address::new_unique(),
        };
        let ix = borrow_obligation_liquidity(&p, &ctx, &reserve, &Address::new_unique(), None, 10);
        assert!(ix.accounts.iter().any(|a| a.address == p.lending));
        assert!(ix.is_lending());
        assert_eq!(ix.signers(), vec![ctx.owner]);
        assert_eq!(ix.kind, InstructionKind::BorrowObligationLiquidity { liquidity_amount: 10 });
    }

    #[test]
    fn token_plumbing_targets_token_programs() {
        let p = programs();
        let (a, b) = (Address::new_unique(), Address::new_unique());
        assert_eq!(sync_native(&p, &a).program_id, p.token);
        assert_eq!(close_account(&p, &a, &b, &b).program_id, p.token);
        assert_eq!(system_transfer(&p, &a, &b, 5).program_id, p.system);
        assert_eq!(set_compute_unit_limit(&p, 1).program_id, p.compute_budget);
        let ata = create_associated_token_account_idempotent(&p, &a, &b, &a, &b, &p.token);
        assert_eq!(ata.program_id, p.associated_token);
        assert_eq!(ata.signers(), vec![a]);
    }
}
