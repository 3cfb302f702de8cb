// 9.0: action sequencer. turns a user intent (deposit, borrow, repay, ...) into
// ordered instruction groups the lending program accepts in one transaction,
// plus optional pre and post transactions.
//
// lifecycle per action: uninitialized -> resolved -> sequenced -> finalized.

mod builders;
mod core;
mod kind;
mod results;
mod setup;

pub use core::{splice_before_close, zip_lending, Action, ActionOptions, ActionSequencer, ActionState, ResolvedLeg};
pub use kind::{ActionKind, Leg, LegOp, LiquidityFlow};
pub use results::{ActionError, ActionTransactions};
