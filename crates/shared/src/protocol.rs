use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    amount::MicroStx,
    domain::{Action, Address, Agreement, AgreementId, AgreementStatus},
    error::RecordError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Network {
    #[default]
    Testnet,
    Mainnet,
}

/// Argument encoding accepted by the wallet and the read-only gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ContractArg {
    Uint(u128),
    Principal(String),
    StringUtf8(String),
}

/// A call against the escrow contract's fixed function surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractCall {
    pub function: String,
    pub args: Vec<ContractArg>,
}

impl ContractCall {
    pub fn create_agreement(buyer: &Address, amount: MicroStx, description: &str) -> Self {
        Self {
            function: "create-agreement".into(),
            args: vec![
                ContractArg::Principal(buyer.0.clone()),
                ContractArg::Uint(u128::from(amount.0)),
                ContractArg::StringUtf8(description.to_string()),
            ],
        }
    }

    pub fn lifecycle(action: Action, id: AgreementId) -> Self {
        Self {
            function: action.contract_function().into(),
            args: vec![ContractArg::Uint(u128::from(id.0))],
        }
    }

    pub fn get_agreement(id: AgreementId) -> Self {
        Self {
            function: "get-agreement".into(),
            args: vec![ContractArg::Uint(u128::from(id.0))],
        }
    }

    pub fn get_agreement_nonce() -> Self {
        Self {
            function: "get-agreement-nonce".into(),
            args: Vec::new(),
        }
    }
}

/// Terminal states of one wallet broadcast attempt. `Finished` means the
/// transaction entered the pending pool, not that the ledger confirmed it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum CallOutcome {
    Finished { txid: String },
    Cancelled,
    Failed { error: String },
}

/// Wire shape of an agreement as returned by `get-agreement`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgreementRecord {
    pub id: u64,
    pub vendor: String,
    pub buyer: String,
    pub amount: u64,
    pub description: String,
    pub status: u8,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<AgreementRecord> for Agreement {
    type Error = RecordError;

    fn try_from(record: AgreementRecord) -> Result<Self, Self::Error> {
        let status = AgreementStatus::try_from(record.status)
            .map_err(|e| RecordError::UnknownStatus(e.0))?;
        if record.vendor == record.buyer {
            return Err(RecordError::SelfDealing(record.vendor));
        }
        if record.amount == 0 {
            return Err(RecordError::ZeroAmount);
        }
        Ok(Agreement {
            id: AgreementId(record.id),
            vendor: Address(record.vendor),
            buyer: Address(record.buyer),
            amount: MicroStx(record.amount),
            description: record.description,
            status,
            created_at: record.created_at,
        })
    }
}

impl From<Agreement> for AgreementRecord {
    fn from(agreement: Agreement) -> Self {
        Self {
            id: agreement.id.0,
            vendor: agreement.vendor.0,
            buyer: agreement.buyer.0,
            amount: agreement.amount.0,
            description: agreement.description,
            status: agreement.status.code(),
            created_at: agreement.created_at,
        }
    }
}
