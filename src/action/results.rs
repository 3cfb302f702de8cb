// 9.0.2: emitted transaction bundles and sequencing errors.

use super::kind::ActionKind;
use crate::config::ConfigError;
use crate::instruction::Instruction;
use crate::integration::{ChainError, SubmissionHandle, SubmitError, TransactionSubmitter};
use crate::market::MarketError;
use crate::obligation::{ObligationError, PositionSide};
use crate::reserve::ReserveError;
use crate::types::{Address, ErrorKind};

/// Finalized output of one action. Submit `pre`, then `lending`, then `post`,
/// each after the previous one confirms.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionTransactions {
    pub pre: Vec<Instruction>,
    pub lending: Vec<Instruction>,
    pub post: Vec<Instruction>,
}

impl ActionTransactions {
    /// Non-empty bundles in submission order.
    pub fn bundles(&self) -> Vec<&[Instruction]> {
        [&self.pre, &self.lending, &self.post]
            .into_iter()
            .filter(|b| !b.is_empty())
            .map(|b| b.as_slice())
            .collect()
    }

    pub fn instruction_count(&self) -> usize {
        self.pre.len() + self.lending.len() + self.post.len()
    }

    /// Hands each non-empty bundle to the submitter in order. Stops at the first failure.
    pub async fn submit(
        &self,
        submitter: &dyn TransactionSubmitter,
        signers: &[Address],
    ) -> Result<Vec<SubmissionHandle>, ActionError> {
        let mut handles = Vec::new();
        for bundle in self.bundles() {
            handles.push(submitter.submit(bundle, signers).await?);
        }
        Ok(handles)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActionError {
    #[error("Obligation {0} not found")]
    ObligationNotFound(Address),

    #[error("No {side:?} position in reserve {reserve}")]
    PositionNotFound { reserve: Address, side: PositionSide },

    #[error("{0:?} needs an outflow reserve")]
    MissingOutflow(ActionKind),

    #[error("{0:?} needs a mint and amount for every leg")]
    MissingAmount(ActionKind),

    #[error("{0:?} needs an obligation")]
    MissingObligation(ActionKind),

    #[error("{0:?} needs an already resolved obligation")]
    ObligationNotResolved(ActionKind),

    #[error("{0:?} does not accept a max amount")]
    MaxNotSupported(ActionKind),

    #[error("{0:?} amount must be positive")]
    ZeroAmount(ActionKind),

    #[error("Action is not sequenced yet")]
    NotSequenced,

    #[error("Action was already finalized")]
    AlreadyFinalized,

    #[error("Obligation already uses all {max} deposit slots")]
    DepositSlotsFull { max: usize },

    #[error("Obligation already uses all {max} borrow slots")]
    BorrowSlotsFull { max: usize },

    #[error("Deposit of {amount} would cross the cap of reserve {reserve}")]
    DepositCapExceeded { reserve: Address, amount: u64 },

    #[error("Borrow of {amount} would cross the cap of reserve {reserve}")]
    BorrowCapExceeded { reserve: Address, amount: u64 },

    #[error("Reserve {reserve} is not part of elevation group {elevation_group}")]
    TierMismatch { reserve: Address, elevation_group: u8 },

    #[error("Obligation error: {0}")]
    Obligation(#[from] ObligationError),

    #[error("Market error: {0}")]
    Market(#[from] MarketError),

    #[error("Reserve error: {0}")]
    Reserve(#[from] ReserveError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Ledger error: {0}")]
    Chain(#[from] ChainError),

    #[error("Submission error: {0}")]
    Submit(#[from] SubmitError),
}

impl ActionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ActionError::ObligationNotFound(_) | ActionError::PositionNotFound { .. } => ErrorKind::NotFound,
            ActionError::MissingOutflow(_)
            | ActionError::MissingAmount(_)
            | ActionError::MissingObligation(_)
            | ActionError::ObligationNotResolved(_)
            | ActionError::MaxNotSupported(_)
            | ActionError::ZeroAmount(_)
            | ActionError::NotSequenced
            | ActionError::AlreadyFinalized => ErrorKind::InvalidState,
            ActionError::DepositSlotsFull { .. }
            | ActionError::BorrowSlotsFull { .. }
            | ActionError::DepositCapExceeded { .. }
            | ActionError::BorrowCapExceeded { .. } => ErrorKind::LimitExceeded,
            ActionError::TierMismatch { .. } => ErrorKind::TierMismatch,
            ActionError::Obligation(e) => e.kind(),
            ActionError::Market(e) => e.kind(),
            ActionError::Reserve(e) => e.kind(),
            ActionError::Config(e) => e.kind(),
            ActionError::Chain(e) => e.kind(),
            ActionError::Submit(_) => ErrorKind::External,
        }
    }
}
