// 9.3 action/builders.rs: one entry point per action kind. Each collects its
// inputs into a request; resolution and sequencing happen in `run`.

use super::core::{Action, ActionOptions, ActionRequest, ActionSequencer};
use super::kind::ActionKind;
use super::results::ActionError;
use crate::obligation::ObligationRef;
use crate::types::{ActionAmount, Address};

impl<'a> ActionSequencer<'a> {
    async fn single_leg(
        &self,
        kind: ActionKind,
        mint: Address,
        amount: ActionAmount,
        obligation: ObligationRef,
        options: &ActionOptions,
    ) -> Result<Action, ActionError> {
        let mut req = ActionRequest::new(kind, obligation.owner(), options);
        req.primary = Some((mint, amount));
        req.obligation = Some(obligation);
        self.run(req).await
    }

    async fn two_leg(
        &self,
        kind: ActionKind,
        primary: (Address, ActionAmount),
        outflow: (Address, ActionAmount),
        obligation: ObligationRef,
        options: &ActionOptions,
    ) -> Result<Action, ActionError> {
        let mut req = ActionRequest::new(kind, obligation.owner(), options);
        req.primary = Some(primary);
        req.outflow = Some(outflow);
        req.obligation = Some(obligation);
        self.run(req).await
    }

    async fn no_obligation(
        &self,
        kind: ActionKind,
        mint: Address,
        amount: ActionAmount,
        owner: Address,
        options: &ActionOptions,
    ) -> Result<Action, ActionError> {
        let mut req = ActionRequest::new(kind, owner, options);
        req.primary = Some((mint, amount));
        self.run(req).await
    }

    /// Deposit liquidity as obligation collateral. Creates the obligation when it is new.
    pub async fn build_deposit_txns(
        &self,
        mint: Address,
        amount: ActionAmount,
        obligation: ObligationRef,
        options: &ActionOptions,
    ) -> Result<Action, ActionError> {
        self.single_leg(ActionKind::Deposit, mint, amount, obligation, options).await
    }

    pub async fn build_borrow_txns(
        &self,
        mint: Address,
        amount: ActionAmount,
        obligation: ObligationRef,
        options: &ActionOptions,
    ) -> Result<Action, ActionError> {
        self.single_leg(ActionKind::Borrow, mint, amount, obligation, options).await
    }

    /// `ActionAmount::Max` withdraws the whole deposit.
    pub async fn build_withdraw_txns(
        &self,
        mint: Address,
        amount: ActionAmount,
        obligation: ObligationRef,
        options: &ActionOptions,
    ) -> Result<Action, ActionError> {
        self.single_leg(ActionKind::Withdraw, mint, amount, obligation, options).await
    }

    /// `ActionAmount::Max` repays the whole debt, compounded to the action's slot.
    pub async fn build_repay_txns(
        &self,
        mint: Address,
        amount: ActionAmount,
        obligation: ObligationRef,
        options: &ActionOptions,
    ) -> Result<Action, ActionError> {
        self.single_leg(ActionKind::Repay, mint, amount, obligation, options).await
    }

    /// Deposit collateral shares the user already holds.
    pub async fn build_deposit_collateral_txns(
        &self,
        mint: Address,
        amount: ActionAmount,
        obligation: ObligationRef,
        options: &ActionOptions,
    ) -> Result<Action, ActionError> {
        self.single_leg(ActionKind::DepositCollateral, mint, amount, obligation, options).await
    }

    /// Liquidity into collateral shares, no obligation involved.
    pub async fn build_mint_txns(
        &self,
        mint: Address,
        amount: ActionAmount,
        owner: Address,
        options: &ActionOptions,
    ) -> Result<Action, ActionError> {
        self.no_obligation(ActionKind::Mint, mint, amount, owner, options).await
    }

    /// Collateral shares back into liquidity. `amount` counts shares.
    pub async fn build_redeem_txns(
        &self,
        mint: Address,
        amount: ActionAmount,
        owner: Address,
        options: &ActionOptions,
    ) -> Result<Action, ActionError> {
        self.no_obligation(ActionKind::Redeem, mint, amount, owner, options).await
    }

    /// Repay `amount` of `repay_mint` debt on someone else's obligation and take
    /// `withdraw_mint` collateral. The obligation must already be loaded.
    #[allow(clippy::too_many_arguments)]
    pub async fn build_liquidate_txns(
        &self,
        liquidator: Address,
        repay_mint: Address,
        withdraw_mint: Address,
        amount: u64,
        min_received: u64,
        max_ltv_override_pct: u64,
        obligation: ObligationRef,
        options: &ActionOptions,
    ) -> Result<Action, ActionError> {
        let mut req = ActionRequest::new(ActionKind::Liquidate, liquidator, options);
        req.primary = Some((repay_mint, ActionAmount::Exact(amount)));
        req.outflow = Some((withdraw_mint, ActionAmount::Exact(amount)));
        req.min_received = min_received;
        req.max_ltv_override_pct = max_ltv_override_pct;
        req.obligation = Some(obligation);
        self.run(req).await
    }

    pub async fn build_deposit_and_borrow_txns(
        &self,
        deposit_mint: Address,
        deposit_amount: ActionAmount,
        borrow_mint: Address,
        borrow_amount: ActionAmount,
        obligation: ObligationRef,
        options: &ActionOptions,
    ) -> Result<Action, ActionError> {
        self.two_leg(
            ActionKind::DepositAndBorrow,
            (deposit_mint, deposit_amount),
            (borrow_mint, borrow_amount),
            obligation,
            options,
        )
        .await
    }

    pub async fn build_repay_and_withdraw_txns(
        &self,
        repay_mint: Address,
        repay_amount: ActionAmount,
        withdraw_mint: Address,
        withdraw_amount: ActionAmount,
        obligation: ObligationRef,
        options: &ActionOptions,
    ) -> Result<Action, ActionError> {
        self.two_leg(
            ActionKind::RepayAndWithdraw,
            (repay_mint, repay_amount),
            (withdraw_mint, withdraw_amount),
            obligation,
            options,
        )
        .await
    }

    pub async fn build_refresh_obligation_txns(
        &self,
        obligation: ObligationRef,
        options: &ActionOptions,
    ) -> Result<Action, ActionError> {
        let mut req = ActionRequest::new(ActionKind::RefreshObligation, obligation.owner(), options);
        req.obligation = Some(obligation);
        self.run(req).await
    }

    /// Sweeps accrued referrer fees of one reserve to the referrer's token account.
    pub async fn build_withdraw_referrer_fees_txns(
        &self,
        mint: Address,
        referrer: Address,
        options: &ActionOptions,
    ) -> Result<Action, ActionError> {
        // the instruction takes everything accrued, the amount is never read
        self.no_obligation(ActionKind::WithdrawReferrerFees, mint, ActionAmount::Exact(1), referrer, options)
            .await
    }

    /// Move an obligation into `elevation_group`. Group 0 leaves any tier.
    pub async fn build_request_elevation_group_txns(
        &self,
        obligation: ObligationRef,
        elevation_group: u8,
        options: &ActionOptions,
    ) -> Result<Action, ActionError> {
        let mut req = ActionRequest::new(ActionKind::RequestElevationGroup, obligation.owner(), options);
        req.elevation_group = Some(elevation_group);
        req.obligation = Some(obligation);
        self.run(req).await
    }
}
