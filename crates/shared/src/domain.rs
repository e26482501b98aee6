use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::amount::MicroStx;

/// Contract-assigned agreement identifier. Ids start at 1 and are immutable.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct AgreementId(pub u64);

impl fmt::Display for AgreementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Ledger principal. Equality is case-sensitive: addresses are canonical on
/// the ledger and are never normalized here.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Address(pub String);

impl Address {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("unknown agreement status code {0}")]
pub struct UnknownStatusCode(pub u8);

/// Lifecycle status as stored by the contract. The numeric codes are the
/// wire encoding and must not be reordered.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "u8", into = "u8")]
#[repr(u8)]
pub enum AgreementStatus {
    Pending = 1,
    Funded = 2,
    Accepted = 3,
    Completed = 4,
    Disputed = 5,
    Refunded = 6,
}

impl AgreementStatus {
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Terminal states accept no further actions from either party.
    pub fn is_terminal(self) -> bool {
        matches!(self, AgreementStatus::Completed | AgreementStatus::Refunded)
    }

    pub fn label(self) -> &'static str {
        match self {
            AgreementStatus::Pending => "Pending",
            AgreementStatus::Funded => "Funded",
            AgreementStatus::Accepted => "Accepted",
            AgreementStatus::Completed => "Completed",
            AgreementStatus::Disputed => "Disputed",
            AgreementStatus::Refunded => "Refunded",
        }
    }
}

impl TryFrom<u8> for AgreementStatus {
    type Error = UnknownStatusCode;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(AgreementStatus::Pending),
            2 => Ok(AgreementStatus::Funded),
            3 => Ok(AgreementStatus::Accepted),
            4 => Ok(AgreementStatus::Completed),
            5 => Ok(AgreementStatus::Disputed),
            6 => Ok(AgreementStatus::Refunded),
            other => Err(UnknownStatusCode(other)),
        }
    }
}

impl From<AgreementStatus> for u8 {
    fn from(status: AgreementStatus) -> Self {
        status.code()
    }
}

impl fmt::Display for AgreementStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Buyer,
    Vendor,
}

/// Lifecycle transitions a party can request from the contract.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Fund,
    Accept,
    Complete,
    Dispute,
}

impl Action {
    pub const ALL: [Action; 4] = [
        Action::Fund,
        Action::Accept,
        Action::Complete,
        Action::Dispute,
    ];

    pub fn contract_function(self) -> &'static str {
        match self {
            Action::Fund => "fund-agreement",
            Action::Accept => "accept-agreement",
            Action::Complete => "complete-agreement",
            Action::Dispute => "dispute-agreement",
        }
    }

    /// Every lifecycle action observed in the deployed contract surface is
    /// buyer-driven. The dispute resolution path (Disputed -> Refunded or
    /// Completed) is external and never requestable from this client.
    pub fn required_role(self) -> Role {
        Role::Buyer
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Action::Fund => "fund",
            Action::Accept => "accept",
            Action::Complete => "complete",
            Action::Dispute => "dispute",
        };
        f.write_str(name)
    }
}

/// The lifecycle transition table. Returns the status an accepted `action`
/// moves `status` to, or `None` when the contract would reject the pair.
///
/// Single source of truth for both the action authorizer and the submitter's
/// optimistic cache update.
pub fn next_status(status: AgreementStatus, action: Action) -> Option<AgreementStatus> {
    match (status, action) {
        (AgreementStatus::Pending, Action::Fund) => Some(AgreementStatus::Funded),
        (AgreementStatus::Funded, Action::Accept) => Some(AgreementStatus::Accepted),
        (AgreementStatus::Accepted, Action::Complete) => Some(AgreementStatus::Completed),
        (AgreementStatus::Accepted, Action::Dispute) => Some(AgreementStatus::Disputed),
        _ => None,
    }
}

/// An escrow agreement as mirrored from contract state. The client's copy is
/// a read-through cache and never authoritative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agreement {
    pub id: AgreementId,
    pub vendor: Address,
    pub buyer: Address,
    pub amount: MicroStx,
    pub description: String,
    pub status: AgreementStatus,
    pub created_at: DateTime<Utc>,
}

impl Agreement {
    pub fn role_of(&self, address: &Address) -> Option<Role> {
        if &self.buyer == address {
            Some(Role::Buyer)
        } else if &self.vendor == address {
            Some(Role::Vendor)
        } else {
            None
        }
    }

    pub fn is_party(&self, address: &Address) -> bool {
        self.role_of(address).is_some()
    }
}

/// Client-side draft for `create-agreement`. The amount stays textual until
/// submission-time validation; the draft is discarded after submission.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAgreementDraft {
    pub buyer: String,
    pub amount: String,
    pub description: String,
}
