// lend-core: client side of a pooled lending market.
// position math mirrors the on-chain program bit for bit; sequencing only emits
// instructions, it never signs or sends them.
//
// file map (search X.0 for structs, X.1+ for logic):
//   1.x  types.rs: primitives: Address, Slot, Timestamp, ActionAmount
//   2.x  fraction.rs: 2^60 scaled fixed point
//   3.x  interest.rs: borrow rate curve, compounding, apr/apy
//   4.x  reserve.rs: reserve snapshot, exchange rate, utilization, caps
//   5.x  market.rs: market config, elevation groups, reserve cache
//   6.x  obligation.rs: position ledger, stats, simulation
//   7.x  instruction.rs: typed instructions and their account lists
//   8.x  config.rs: program ids, limits, env presets
//   9.x  action/: action sequencer: resolve, sequence, finalize
//   --   integration.rs: ledger reader, decoder, oracle, deriver, submitter traits

// model
pub mod fraction;
pub mod interest;
pub mod market;
pub mod obligation;
pub mod reserve;
pub mod types;

// sequencing
pub mod action;
pub mod config;
pub mod instruction;

// collaborators
pub mod integration;

#[cfg(test)]
mod fixtures;

// re exports for convenience
pub use action::*;
pub use config::*;
pub use fraction::*;
pub use integration::*;
pub use interest::*;
pub use market::*;
pub use obligation::*;
pub use reserve::*;
pub use types::*;
pub use instruction::{AccountMeta, Instruction, InstructionKind, LendingContext};
