//! Core types and data structures for the split ledger

use bigdecimal::BigDecimal;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::money::{Money, MoneyError};
use crate::split::SplitError;

/// Identifier of a registered member
pub type MemberId = String;

/// The only currency groups are kept in
pub const GROUP_CURRENCY: &str = "EUR";

/// Minimum number of members a group is created with
pub const MIN_GROUP_MEMBERS: usize = 2;

/// A registered person who can belong to groups
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    /// Unique identifier
    pub id: MemberId,
    /// Login name, unique across the registry
    pub username: String,
    /// Name shown to other members
    pub display_name: String,
    /// When the member was registered
    pub created_at: NaiveDateTime,
}

impl Member {
    /// Create a new member with a fresh id
    pub fn new(username: String, display_name: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            username,
            display_name,
            created_at: chrono::Utc::now().naive_utc(),
        }
    }
}

/// A set of members sharing expenses
///
/// Membership is fixed at creation; the order of `members` is the order used
/// to hand out rounding remainders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub id: String,
    pub name: String,
    pub members: Vec<MemberId>,
    pub currency: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Group {
    /// Create a new group with a fresh id
    pub fn new(name: String, members: Vec<MemberId>) -> Self {
        let now = chrono::Utc::now().naive_utc();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name,
            members,
            currency: GROUP_CURRENCY.to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn has_member(&self, member_id: &str) -> bool {
        self.members.iter().any(|m| m == member_id)
    }

    /// Position of a member in the group order
    pub fn position(&self, member_id: &str) -> Option<usize> {
        self.members.iter().position(|m| m == member_id)
    }

    pub(crate) fn touch(&mut self) {
        self.updated_at = chrono::Utc::now().naive_utc();
    }
}

/// How a transaction amount is divided
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitType {
    /// Evenly among participants
    Equal,
    /// By percentage per member, stored as absolute amounts
    Percentage,
    /// By explicit absolute amount per member
    Custom,
    /// Direct transfer from payer to recipient
    Payment,
}

impl fmt::Display for SplitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SplitType::Equal => "equal",
            SplitType::Percentage => "percentage",
            SplitType::Custom => "custom",
            SplitType::Payment => "payment",
        };
        f.write_str(name)
    }
}

/// Split strategy with its inputs, as submitted by a caller
#[derive(Debug, Clone, PartialEq)]
pub enum SplitSpec {
    /// Optional explicit participants; defaults to the whole group
    Equal { participants: Option<Vec<MemberId>> },
    /// Percent per member
    Percentage(BTreeMap<MemberId, BigDecimal>),
    /// Absolute amount per member
    Custom(BTreeMap<MemberId, Money>),
    /// Transfer to `recipient_id`
    Payment { recipient_id: MemberId },
}

impl SplitSpec {
    pub fn split_type(&self) -> SplitType {
        match self {
            SplitSpec::Equal { .. } => SplitType::Equal,
            SplitSpec::Percentage(_) => SplitType::Percentage,
            SplitSpec::Custom(_) => SplitType::Custom,
            SplitSpec::Payment { .. } => SplitType::Payment,
        }
    }

    /// Assemble a split from the loose fields of a form submission
    ///
    /// `details` carries percentages for percentage splits and amounts for
    /// custom splits.
    pub fn from_parts(
        split_type: SplitType,
        details: Option<BTreeMap<MemberId, BigDecimal>>,
        recipient_id: Option<MemberId>,
        participants: Option<Vec<MemberId>>,
    ) -> LedgerResult<Self> {
        if participants.is_some() && split_type != SplitType::Equal {
            return Err(SplitError::UnexpectedParticipants(split_type).into());
        }
        match split_type {
            SplitType::Equal => {
                if details.is_some() {
                    return Err(SplitError::UnexpectedSplitDetails(split_type).into());
                }
                Ok(SplitSpec::Equal { participants })
            }
            SplitType::Percentage => {
                let details = details.ok_or(SplitError::MissingSplitDetails(split_type))?;
                Ok(SplitSpec::Percentage(details))
            }
            SplitType::Custom => {
                let details = details.ok_or(SplitError::MissingSplitDetails(split_type))?;
                let amounts = details
                    .into_iter()
                    .map(|(member, value)| Ok((member, Money::from_decimal(&value)?)))
                    .collect::<Result<BTreeMap<_, _>, MoneyError>>()?;
                Ok(SplitSpec::Custom(amounts))
            }
            SplitType::Payment => {
                if details.is_some() {
                    return Err(SplitError::UnexpectedSplitDetails(split_type).into());
                }
                let recipient_id = recipient_id.ok_or(SplitError::MissingRecipient)?;
                Ok(SplitSpec::Payment { recipient_id })
            }
        }
    }
}

/// A transaction as submitted for creation or full replacement
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionDraft {
    pub description: String,
    pub amount: Money,
    pub payer_id: MemberId,
    pub currency: String,
    pub split: SplitSpec,
}

impl TransactionDraft {
    /// Create a draft in the group currency
    pub fn new(description: String, amount: Money, payer_id: MemberId, split: SplitSpec) -> Self {
        Self {
            description,
            amount,
            payer_id,
            currency: GROUP_CURRENCY.to_string(),
            split,
        }
    }
}

/// A recorded expense or payment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Unique identifier for the transaction
    pub id: String,
    /// Group the transaction belongs to
    pub group_id: String,
    pub description: String,
    pub amount: Money,
    pub currency: String,
    /// Member who paid
    pub payer_id: MemberId,
    pub split_type: SplitType,
    /// Absolute share per member; percentage and custom splits only
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub split_details: Option<BTreeMap<MemberId, Money>>,
    /// Payment recipient; payment splits only
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub recipient_id: Option<MemberId>,
    /// Members sharing an equal split, in group order
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub participants: Vec<MemberId>,
    /// Bumped on every edit
    pub version: u64,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Errors that can occur in the split ledger
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Storage error: {0}")]
    Storage(String),
    #[error(transparent)]
    Split(#[from] SplitError),
    #[error(transparent)]
    Money(#[from] MoneyError),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Unsupported currency {0}, groups are kept in EUR")]
    UnsupportedCurrency(String),
    #[error("A group needs at least 2 members, got {count}")]
    InsufficientMembers { count: usize },
    #[error("Member {0} is listed more than once")]
    DuplicateMember(MemberId),
    #[error("Username already taken: {0}")]
    DuplicateUsername(String),
    #[error("Transaction belongs to group {expected}, not {actual}")]
    GroupMismatch { expected: String, actual: String },
    #[error("Member not found: {0}")]
    MemberNotFound(MemberId),
    #[error("Group not found: {0}")]
    GroupNotFound(String),
    #[error("Transaction not found: {0}")]
    TransactionNotFound(String),
    #[error("Balances of group {0} would leave the supported range")]
    BalanceOverflow(String),
    #[error("Transaction {transaction_id} was modified: expected version {expected}, found {actual}")]
    VersionConflict {
        transaction_id: String,
        expected: u64,
        actual: u64,
    },
}

impl LedgerError {
    /// Whether the caller can fix the request and resubmit
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            LedgerError::Split(_)
                | LedgerError::Money(_)
                | LedgerError::Validation(_)
                | LedgerError::UnsupportedCurrency(_)
                | LedgerError::InsufficientMembers { .. }
                | LedgerError::DuplicateMember(_)
                | LedgerError::DuplicateUsername(_)
                | LedgerError::GroupMismatch { .. }
                | LedgerError::MemberNotFound(_)
                | LedgerError::BalanceOverflow(_)
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            LedgerError::GroupNotFound(_) | LedgerError::TransactionNotFound(_)
        )
    }
}

/// Result type for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    #[test]
    fn test_group_member_lookup() {
        let group = Group::new(
            "Flat".to_string(),
            vec!["a".to_string(), "b".to_string(), "c".to_string()],
        );
        assert!(group.has_member("b"));
        assert!(!group.has_member("z"));
        assert_eq!(group.position("c"), Some(2));
        assert_eq!(group.currency, GROUP_CURRENCY);
    }

    #[test]
    fn test_split_type_wire_names() {
        assert_eq!(
            serde_json::to_string(&SplitType::Percentage).unwrap(),
            "\"percentage\""
        );
        let parsed: SplitType = serde_json::from_str("\"payment\"").unwrap();
        assert_eq!(parsed, SplitType::Payment);
        assert_eq!(SplitType::Custom.to_string(), "custom");
    }

    #[test]
    fn test_from_parts_custom_converts_amounts() {
        let mut details = BTreeMap::new();
        details.insert("a".to_string(), dec("12.5"));
        let spec = SplitSpec::from_parts(SplitType::Custom, Some(details), None, None).unwrap();
        match spec {
            SplitSpec::Custom(amounts) => {
                assert_eq!(amounts["a"], Money::from_minor_units(1250));
            }
            other => panic!("Expected custom split, got {:?}", other),
        }
    }

    #[test]
    fn test_from_parts_rejects_missing_details() {
        let err = SplitSpec::from_parts(SplitType::Percentage, None, None, None).unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Split(SplitError::MissingSplitDetails(SplitType::Percentage))
        ));
    }

    #[test]
    fn test_from_parts_payment_requires_recipient() {
        let err = SplitSpec::from_parts(SplitType::Payment, None, None, None).unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Split(SplitError::MissingRecipient)
        ));

        let spec =
            SplitSpec::from_parts(SplitType::Payment, None, Some("b".to_string()), None).unwrap();
        assert_eq!(spec.split_type(), SplitType::Payment);
    }

    #[test]
    fn test_from_parts_rejects_details_on_equal() {
        let err =
            SplitSpec::from_parts(SplitType::Equal, Some(BTreeMap::new()), None, None).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_from_parts_rejects_participants_outside_equal() {
        let participants = Some(vec!["a".to_string()]);
        let mut details = BTreeMap::new();
        details.insert("a".to_string(), dec("100"));

        for (split_type, details, recipient) in [
            (SplitType::Percentage, Some(details.clone()), None),
            (SplitType::Custom, Some(details), None),
            (SplitType::Payment, None, Some("b".to_string())),
        ] {
            let err = SplitSpec::from_parts(split_type, details, recipient, participants.clone())
                .unwrap_err();
            assert!(
                matches!(err, LedgerError::Split(SplitError::UnexpectedParticipants(t)) if t == split_type),
                "{:?}",
                err
            );
        }

        let spec =
            SplitSpec::from_parts(SplitType::Equal, None, None, participants.clone()).unwrap();
        assert_eq!(spec, SplitSpec::Equal { participants });
    }

    #[test]
    fn test_error_classification() {
        assert!(LedgerError::InsufficientMembers { count: 1 }.is_validation());
        assert!(LedgerError::GroupNotFound("g".to_string()).is_not_found());
        let conflict = LedgerError::VersionConflict {
            transaction_id: "t".to_string(),
            expected: 1,
            actual: 2,
        };
        assert!(!conflict.is_validation());
        assert!(!conflict.is_not_found());
    }
}
