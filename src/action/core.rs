// 9.0 action/core.rs: the action builder object and the sequencer handle.

use super::kind::{ActionKind, Leg, LegOp};
use super::results::{ActionError, ActionTransactions};
use crate::config::SequencerConfig;
use crate::instruction::{Instruction, InstructionKind};
use crate::integration::{AccountDecoder, AddressDeriver, LedgerReader};
use crate::market::MarketView;
use crate::obligation::{ObligationRef, PositionLedger};
use crate::reserve::ReserveView;
use crate::types::{ActionAmount, Address, Slot};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionState {
    Uninitialized,
    Resolved,
    Sequenced,
    Finalized,
}

/// One leg after amount resolution.
#[derive(Debug, Clone)]
pub struct ResolvedLeg {
    pub leg: Leg,
    pub op: LegOp,
    pub reserve: Arc<ReserveView>,
    // what goes into the lending instruction, u64::MAX for "everything"
    pub instruction_amount: u64,
    // liquidity the user's token account must hold, used for native wrapping
    pub token_amount: u64,
    // repay covers the whole projected debt, or withdraw takes the whole deposit
    pub clears_position: bool,
    pub liquidity_account: Address,
    pub collateral_account: Option<Address>,
}

/// Per-call knobs. Everything defaults to "owner pays, no referrer, no tier change".
#[derive(Debug, Clone, Default)]
pub struct ActionOptions {
    pub payer: Option<Address>,
    pub referrer: Option<Address>,
    pub request_elevation_group: bool,
    // defaults to the reader's current slot
    pub slot: Option<Slot>,
}

/// Everything a builder collected before resolution.
#[derive(Debug, Clone)]
pub(super) struct ActionRequest {
    pub kind: ActionKind,
    pub owner: Address,
    pub obligation: Option<ObligationRef>,
    pub primary: Option<(Address, ActionAmount)>,
    pub outflow: Option<(Address, ActionAmount)>,
    pub elevation_group: Option<u8>,
    pub min_received: u64,
    pub max_ltv_override_pct: u64,
    pub options: ActionOptions,
}

impl ActionRequest {
    pub fn new(kind: ActionKind, owner: Address, options: &ActionOptions) -> Self {
        Self {
            kind,
            owner,
            obligation: None,
            primary: None,
            outflow: None,
            elevation_group: None,
            min_received: 0,
            max_ltv_override_pct: 0,
            options: options.clone(),
        }
    }
}

/// Single-use builder holding the ordered instruction groups of one action.
#[derive(Debug, Clone)]
pub struct Action {
    pub kind: ActionKind,
    pub owner: Address,
    pub payer: Address,
    pub obligation: Option<Address>,
    pub slot: Slot,
    // pools the action refreshes itself, leg order
    pub current_pools: Vec<Address>,
    // obligation pools refreshed in the general pass (never overlaps current_pools)
    pub refreshed_other_pools: Vec<Address>,
    // pools kept in the in-between obligation refresh for the second leg
    pub preloaded_pools: Vec<Address>,
    pub(super) state: ActionState,
    pub(super) legs: Vec<ResolvedLeg>,
    pub(super) ledger: Option<PositionLedger>,
    pub(super) obligation_exists: bool,
    pub(super) target_elevation_group: Option<u8>,
    pub(super) pre_transaction: Vec<Instruction>,
    pub(super) setup: Vec<Instruction>,
    pub(super) lending: Vec<Instruction>,
    pub(super) in_between: Vec<Instruction>,
    pub(super) cleanup: Vec<Instruction>,
    pub(super) post_transaction: Vec<Instruction>,
    pub(super) refresh_farms_cleanup: Vec<Instruction>,
}

impl Action {
    pub(super) fn new(kind: ActionKind, owner: Address, payer: Address, slot: Slot) -> Self {
        Self {
            kind,
            owner,
            payer,
            obligation: None,
            slot,
            current_pools: Vec::new(),
            refreshed_other_pools: Vec::new(),
            preloaded_pools: Vec::new(),
            state: ActionState::Uninitialized,
            legs: Vec::new(),
            ledger: None,
            obligation_exists: false,
            target_elevation_group: None,
            pre_transaction: Vec::new(),
            setup: Vec::new(),
            lending: Vec::new(),
            in_between: Vec::new(),
            cleanup: Vec::new(),
            post_transaction: Vec::new(),
            refresh_farms_cleanup: Vec::new(),
        }
    }

    pub fn state(&self) -> ActionState {
        self.state
    }

    pub fn legs(&self) -> &[ResolvedLeg] {
        &self.legs
    }

    pub fn leg(&self, leg: Leg) -> Option<&ResolvedLeg> {
        self.legs.iter().find(|l| l.leg == leg)
    }

    pub fn ledger(&self) -> Option<&PositionLedger> {
        self.ledger.as_ref()
    }

    pub fn obligation_exists(&self) -> bool {
        self.obligation_exists
    }

    pub fn target_elevation_group(&self) -> Option<u8> {
        self.target_elevation_group
    }

    pub fn pre_transaction_ixs(&self) -> &[Instruction] {
        &self.pre_transaction
    }

    pub fn setup_ixs(&self) -> &[Instruction] {
        &self.setup
    }

    pub fn lending_ixs(&self) -> &[Instruction] {
        &self.lending
    }

    pub fn in_between_ixs(&self) -> &[Instruction] {
        &self.in_between
    }

    /// Cleanup as emitted, farm refreshes already spliced in.
    pub fn cleanup_ixs(&self) -> Vec<Instruction> {
        splice_before_close(&self.cleanup, &self.refresh_farms_cleanup)
    }

    pub fn refresh_farms_cleanup_ixs(&self) -> &[Instruction] {
        &self.refresh_farms_cleanup
    }

    pub fn post_transaction_ixs(&self) -> &[Instruction] {
        &self.post_transaction
    }

    /// Lending transaction: setup, zipped lending legs, cleanup.
    pub fn lending_transaction(&self) -> Vec<Instruction> {
        let mut out = zip_lending(&self.setup, &self.lending, &self.in_between);
        out.extend(self.cleanup_ixs());
        out
    }

    /// Hands out the instruction bundles. Allowed once, after sequencing.
    pub fn finalize(&mut self) -> Result<ActionTransactions, ActionError> {
        match self.state {
            ActionState::Sequenced => {}
            ActionState::Finalized => return Err(ActionError::AlreadyFinalized),
            ActionState::Uninitialized | ActionState::Resolved => return Err(ActionError::NotSequenced),
        }
        let txns = ActionTransactions {
            pre: self.pre_transaction.clone(),
            lending: self.lending_transaction(),
            post: self.post_transaction.clone(),
        };
        self.state = ActionState::Finalized;
        Ok(txns)
    }
}

/// `setup, lending[0], in_between, lending[1]`. With one lending instruction the
/// in-between group is not emitted.
pub fn zip_lending(setup: &[Instruction], lending: &[Instruction], in_between: &[Instruction]) -> Vec<Instruction> {
    let mut out = setup.to_vec();
    match lending {
        [first, second] => {
            out.push(first.clone());
            out.extend_from_slice(in_between);
            out.push(second.clone());
        }
        _ => out.extend_from_slice(lending),
    }
    out
}

/// Inserts `farms` ahead of a trailing close-account, or appends when there is none.
pub fn splice_before_close(cleanup: &[Instruction], farms: &[Instruction]) -> Vec<Instruction> {
    let mut out = cleanup.to_vec();
    let trailing_close = matches!(out.last(), Some(ix) if ix.kind == InstructionKind::CloseAccount);
    if trailing_close {
        let at = out.len() - 1;
        out.splice(at..at, farms.iter().cloned());
    } else {
        out.extend_from_slice(farms);
    }
    out
}

/// Builds actions against one market snapshot. Holds no mutable state; every
/// build call owns its own `Action`.
pub struct ActionSequencer<'a> {
    pub(super) market: &'a MarketView,
    pub(super) reader: &'a dyn LedgerReader,
    pub(super) decoder: &'a dyn AccountDecoder,
    pub(super) deriver: &'a dyn AddressDeriver,
    pub(super) config: SequencerConfig,
}

impl<'a> ActionSequencer<'a> {
    pub fn new(
        market: &'a MarketView,
        reader: &'a dyn LedgerReader,
        decoder: &'a dyn AccountDecoder,
        deriver: &'a dyn AddressDeriver,
        config: SequencerConfig,
    ) -> Result<Self, ActionError> {
        config.validate()?;
        Ok(Self {
            market,
            reader,
            decoder,
            deriver,
            config,
        })
    }

    pub fn config(&self) -> &SequencerConfig {
        &self.config
    }

    pub fn market(&self) -> &MarketView {
        self.market
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProgramIds;
    use crate::instruction::{close_account, refresh_obligation, set_compute_unit_limit, sync_native};

    fn programs() -> ProgramIds {
        ProgramIds::new(Address::new_unique(), Address::new_unique())
    }

    fn marker(p: &ProgramIds, units: u32) -> Instruction {
        set_compute_unit_limit(p, units)
    }

    #[test]
    fn zipper_interleaves_two_legs() {
        let p = programs();
        let setup = vec![marker(&p, 1)];
        let lending = vec![marker(&p, 2), marker(&p, 4)];
        let in_between = vec![marker(&p, 3)];
        let out = zip_lending(&setup, &lending, &in_between);
        let order: Vec<_> = out
            .iter()
            .map(|ix| match ix.kind {
                InstructionKind::SetComputeUnitLimit { units } => units,
                _ => 0,
            })
            .collect();
        assert_eq!(order, vec![1, 2, 3, 4]);
    }

    #[test]
    fn zipper_single_leg_skips_in_between() {
        let p = programs();
        let out = zip_lending(&[marker(&p, 1)], &[marker(&p, 2)], &[marker(&p, 3)]);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn farms_splice_before_trailing_close() {
        let p = programs();
        let (a, b) = (Address::new_unique(), Address::new_unique());
        let farm = refresh_obligation(&p, &a, &b, &[]);
        let cleanup = vec![sync_native(&p, &a), close_account(&p, &a, &b, &b)];
        let out = splice_before_close(&cleanup, &[farm.clone()]);
        assert_eq!(out.len(), 3);
        assert_eq!(out[1], farm);
        assert_eq!(out[2].kind, InstructionKind::CloseAccount);

        let appended = splice_before_close(&[sync_native(&p, &a)], &[farm.clone()]);
        assert_eq!(appended.last(), Some(&farm));
    }

    #[test]
    fn finalize_once_after_sequencing() {
        let mut action = Action::new(ActionKind::Deposit, Address::new_unique(), Address::new_unique(), 0);
        assert_eq!(action.finalize(), Err(ActionError::NotSequenced));
        action.state = ActionState::Sequenced;
        assert!(action.finalize().is_ok());
        assert_eq!(action.state(), ActionState::Finalized);
        let again = action.finalize().unwrap_err();
        assert_eq!(again, ActionError::AlreadyFinalized);
        assert_eq!(again.kind(), crate::types::ErrorKind::InvalidState);
    }
}
