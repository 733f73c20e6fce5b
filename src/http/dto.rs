//! Request and response bodies of the JSON API

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::ledger::GroupBalances;
use crate::money::{deserialize_decimal_map, Money};
use crate::types::*;

/// Body of `POST /members`
#[derive(Debug, Clone, Deserialize)]
pub struct MemberPayload {
    pub username: String,
    pub display_name: String,
}

/// Body of `POST /groups`
#[derive(Debug, Clone, Deserialize)]
pub struct GroupPayload {
    pub name: String,
    pub members: Vec<MemberId>,
}

/// Body of transaction create and replace requests
///
/// `amount` and the values of `custom_splits` accept JSON numbers as well as
/// numeric strings. `custom_splits` holds percentages for percentage splits
/// and amounts for custom splits.
#[derive(Debug, Clone, Deserialize)]
pub struct TransactionPayload {
    #[serde(default)]
    pub group_id: Option<String>,
    pub description: String,
    pub amount: Money,
    pub payer_id: MemberId,
    #[serde(default)]
    pub currency: Option<String>,
    pub split_type: SplitType,
    #[serde(default, deserialize_with = "deserialize_decimal_map")]
    pub custom_splits: Option<BTreeMap<MemberId, BigDecimal>>,
    #[serde(default)]
    pub recipient_id: Option<MemberId>,
    #[serde(default)]
    pub participants: Option<Vec<MemberId>>,
    /// Version being edited; replace requests only
    #[serde(default)]
    pub version: Option<u64>,
}

impl TransactionPayload {
    /// Reject a body that names a different group than the target
    pub fn check_group(&self, group_id: &str) -> LedgerResult<()> {
        match &self.group_id {
            Some(body_group) if body_group != group_id => Err(LedgerError::GroupMismatch {
                expected: group_id.to_string(),
                actual: body_group.clone(),
            }),
            _ => Ok(()),
        }
    }

    pub fn into_draft(self) -> LedgerResult<TransactionDraft> {
        let split = SplitSpec::from_parts(
            self.split_type,
            self.custom_splits,
            self.recipient_id,
            self.participants,
        )?;

        Ok(TransactionDraft {
            description: self.description,
            amount: self.amount,
            payer_id: self.payer_id,
            currency: self.currency.unwrap_or_else(|| GROUP_CURRENCY.to_string()),
            split,
        })
    }
}

/// A group together with its current balances
#[derive(Debug, Clone, Serialize)]
pub struct GroupView {
    #[serde(flatten)]
    pub group: Group,
    pub balances: GroupBalances,
}

/// A transaction, with percentages recovered for percentage splits
#[derive(Debug, Clone, Serialize)]
pub struct TransactionView {
    #[serde(flatten)]
    pub transaction: Transaction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percentages: Option<BTreeMap<MemberId, BigDecimal>>,
}

impl From<Transaction> for TransactionView {
    fn from(transaction: Transaction) -> Self {
        Self {
            percentages: transaction.percentages(),
            transaction,
        }
    }
}

/// Body of every error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub detail: String,
}
