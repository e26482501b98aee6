use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{AgreementId, AgreementStatus};

/// Draft amount validation failures. These are caught before any wallet or
/// network interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmountError {
    #[error("amount is empty")]
    Empty,
    #[error("amount is not a number")]
    NotANumber,
    #[error("amount must be greater than zero")]
    NotPositive,
    #[error("amount has more than 6 fractional digits")]
    TooPrecise,
    #[error("amount exceeds the representable range")]
    TooLarge,
}

/// A projected contract record that violates the agreement invariants.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error("unknown agreement status code {0}")]
    UnknownStatus(u8),
    #[error("vendor and buyer are the same principal: {0}")]
    SelfDealing(String),
    #[error("agreement amount must be positive")]
    ZeroAmount,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepositoryError {
    #[error("agreement {0} not found")]
    NotFound(AgreementId),
    #[error("contract gateway error: {0}")]
    Gateway(String),
    #[error("invalid agreement record: {0}")]
    InvalidRecord(#[from] RecordError),
}

/// The exhaustive set of terminal results for one submission attempt. Every
/// `submit` invocation resolves to exactly one of these; none is silently
/// dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum SubmitOutcome {
    /// Broadcast accepted into the pending pool; the cached status was
    /// optimistically advanced and awaits reconciliation.
    Accepted { optimistic_status: AgreementStatus },
    /// The user aborted wallet signing. Cached state is untouched.
    Cancelled,
    /// Signing or broadcast failed. Cached state is untouched.
    SubmissionFailed { error: String },
    /// The authorizer vetoed the action; no boundary call was made.
    IllegalAction,
    /// Another submission for this agreement is still in flight.
    AlreadyPending,
}
