// 9.1 action/kind.rs: the closed set of actions and the per-leg operation table.
// every sequencing decision (refresh targets, farm modes, tier checks, limits,
// token flows) is an exhaustive match here, so a new kind fails to compile until
// each site is filled in.

use crate::obligation::SimulationAction;
use crate::reserve::FarmMode;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionKind {
    Deposit,
    Borrow,
    Withdraw,
    Repay,
    Mint,
    Redeem,
    DepositCollateral,
    Liquidate,
    DepositAndBorrow,
    RepayAndWithdraw,
    RefreshObligation,
    WithdrawReferrerFees,
    RequestElevationGroup,
}

/// Which reserve of an action a leg runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Leg {
    Primary,
    Outflow,
}

/// One lending-program operation against one reserve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LegOp {
    Deposit,
    Borrow,
    Withdraw,
    Repay,
    Mint,
    Redeem,
    DepositCollateral,
    LiquidateRepay,
    LiquidateWithdraw,
    ReferrerFees,
}

/// Direction liquidity moves relative to the user's token account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiquidityFlow {
    FromUser,
    ToUser,
}

impl ActionKind {
    pub const ALL: [ActionKind; 13] = [
        ActionKind::Deposit,
        ActionKind::Borrow,
        ActionKind::Withdraw,
        ActionKind::Repay,
        ActionKind::Mint,
        ActionKind::Redeem,
        ActionKind::DepositCollateral,
        ActionKind::Liquidate,
        ActionKind::DepositAndBorrow,
        ActionKind::RepayAndWithdraw,
        ActionKind::RefreshObligation,
        ActionKind::WithdrawReferrerFees,
        ActionKind::RequestElevationGroup,
    ];

    /// Legs in execution order. Their reserves are the pools the action refreshes itself.
    pub fn legs(&self) -> &'static [(Leg, LegOp)] {
        match self {
            ActionKind::Deposit => &[(Leg::Primary, LegOp::Deposit)],
            ActionKind::Borrow => &[(Leg::Primary, LegOp::Borrow)],
            ActionKind::Withdraw => &[(Leg::Primary, LegOp::Withdraw)],
            ActionKind::Repay => &[(Leg::Primary, LegOp::Repay)],
            ActionKind::Mint => &[(Leg::Primary, LegOp::Mint)],
            ActionKind::Redeem => &[(Leg::Primary, LegOp::Redeem)],
            ActionKind::DepositCollateral => &[(Leg::Primary, LegOp::DepositCollateral)],
            ActionKind::Liquidate => &[
                (Leg::Primary, LegOp::LiquidateRepay),
                (Leg::Outflow, LegOp::LiquidateWithdraw),
            ],
            ActionKind::DepositAndBorrow => &[(Leg::Primary, LegOp::Deposit), (Leg::Outflow, LegOp::Borrow)],
            ActionKind::RepayAndWithdraw => &[(Leg::Primary, LegOp::Repay), (Leg::Outflow, LegOp::Withdraw)],
            ActionKind::RefreshObligation => &[],
            ActionKind::WithdrawReferrerFees => &[(Leg::Primary, LegOp::ReferrerFees)],
            ActionKind::RequestElevationGroup => &[],
        }
    }

    /// Two lending instructions with an in-between group.
    pub fn is_composite(&self) -> bool {
        match self {
            ActionKind::DepositAndBorrow | ActionKind::RepayAndWithdraw => true,
            ActionKind::Deposit
            | ActionKind::Borrow
            | ActionKind::Withdraw
            | ActionKind::Repay
            | ActionKind::Mint
            | ActionKind::Redeem
            | ActionKind::DepositCollateral
            | ActionKind::Liquidate
            | ActionKind::RefreshObligation
            | ActionKind::WithdrawReferrerFees
            | ActionKind::RequestElevationGroup => false,
        }
    }

    pub fn requires_outflow(&self) -> bool {
        self.legs().iter().any(|(leg, _)| *leg == Leg::Outflow)
    }

    pub fn uses_obligation(&self) -> bool {
        match self {
            ActionKind::Mint | ActionKind::Redeem | ActionKind::WithdrawReferrerFees => false,
            ActionKind::Deposit
            | ActionKind::Borrow
            | ActionKind::Withdraw
            | ActionKind::Repay
            | ActionKind::DepositCollateral
            | ActionKind::Liquidate
            | ActionKind::DepositAndBorrow
            | ActionKind::RepayAndWithdraw
            | ActionKind::RefreshObligation
            | ActionKind::RequestElevationGroup => true,
        }
    }

    /// Kinds allowed to bootstrap an obligation that does not exist yet.
    pub fn may_create_obligation(&self) -> bool {
        match self {
            ActionKind::Deposit | ActionKind::DepositCollateral | ActionKind::DepositAndBorrow => true,
            ActionKind::Borrow
            | ActionKind::Withdraw
            | ActionKind::Repay
            | ActionKind::Mint
            | ActionKind::Redeem
            | ActionKind::Liquidate
            | ActionKind::RepayAndWithdraw
            | ActionKind::RefreshObligation
            | ActionKind::WithdrawReferrerFees
            | ActionKind::RequestElevationGroup => false,
        }
    }

    /// Kinds whose first leg may ask the ledger for a tier upgrade.
    pub fn supports_tier_upgrade(&self) -> bool {
        matches!(self, ActionKind::DepositAndBorrow)
    }

    pub fn simulation_action(&self) -> Option<SimulationAction> {
        match self {
            ActionKind::Deposit | ActionKind::DepositCollateral => Some(SimulationAction::Deposit),
            ActionKind::Borrow => Some(SimulationAction::Borrow),
            ActionKind::Withdraw => Some(SimulationAction::Withdraw),
            ActionKind::Repay => Some(SimulationAction::Repay),
            ActionKind::DepositAndBorrow => Some(SimulationAction::DepositAndBorrow),
            ActionKind::RepayAndWithdraw => Some(SimulationAction::RepayAndWithdraw),
            ActionKind::Mint
            | ActionKind::Redeem
            | ActionKind::Liquidate
            | ActionKind::RefreshObligation
            | ActionKind::WithdrawReferrerFees
            | ActionKind::RequestElevationGroup => None,
        }
    }
}

impl LegOp {
    pub fn liquidity_flow(&self) -> Option<LiquidityFlow> {
        match self {
            LegOp::Deposit | LegOp::Repay | LegOp::Mint | LegOp::LiquidateRepay => Some(LiquidityFlow::FromUser),
            LegOp::Borrow
            | LegOp::Withdraw
            | LegOp::Redeem
            | LegOp::LiquidateWithdraw
            | LegOp::ReferrerFees => Some(LiquidityFlow::ToUser),
            // moves collateral shares only
            LegOp::DepositCollateral => None,
        }
    }

    pub fn uses_collateral_account(&self) -> bool {
        match self {
            LegOp::Mint | LegOp::Redeem | LegOp::DepositCollateral => true,
            LegOp::Deposit
            | LegOp::Borrow
            | LegOp::Withdraw
            | LegOp::Repay
            | LegOp::LiquidateRepay
            | LegOp::LiquidateWithdraw
            | LegOp::ReferrerFees => false,
        }
    }

    pub fn farm_mode(&self) -> Option<FarmMode> {
        match self {
            LegOp::Deposit | LegOp::Withdraw | LegOp::DepositCollateral | LegOp::LiquidateWithdraw => {
                Some(FarmMode::Collateral)
            }
            LegOp::Borrow | LegOp::Repay | LegOp::LiquidateRepay => Some(FarmMode::Debt),
            LegOp::Mint | LegOp::Redeem | LegOp::ReferrerFees => None,
        }
    }

    /// Legs that grow the obligation must stay inside its elevation group.
    pub fn checks_tier(&self) -> bool {
        match self {
            LegOp::Deposit | LegOp::Borrow | LegOp::DepositCollateral => true,
            LegOp::Withdraw
            | LegOp::Repay
            | LegOp::Mint
            | LegOp::Redeem
            | LegOp::LiquidateRepay
            | LegOp::LiquidateWithdraw
            | LegOp::ReferrerFees => false,
        }
    }

    pub fn adds_deposit(&self) -> bool {
        matches!(self, LegOp::Deposit | LegOp::DepositCollateral)
    }

    pub fn adds_borrow(&self) -> bool {
        matches!(self, LegOp::Borrow)
    }

    /// `ActionAmount::Max` resolves only where the position bounds it.
    pub fn supports_max(&self) -> bool {
        matches!(self, LegOp::Withdraw | LegOp::Repay)
    }

    pub fn needs_obligation_refresh(&self) -> bool {
        match self {
            LegOp::Mint | LegOp::Redeem | LegOp::ReferrerFees => false,
            LegOp::Deposit
            | LegOp::Borrow
            | LegOp::Withdraw
            | LegOp::Repay
            | LegOp::DepositCollateral
            | LegOp::LiquidateRepay
            | LegOp::LiquidateWithdraw => true,
        }
    }
}
