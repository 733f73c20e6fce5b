//! Split computation: turning an amount and a strategy into member shares

pub mod allocation;
pub mod resolver;

pub use allocation::*;
pub use resolver::*;

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::money::Money;
use crate::types::{MemberId, SplitType, Transaction};

/// Basis points in one hundred percent
const BASIS_POINTS: i64 = 10_000;

/// What a transaction does to the balances of its group
///
/// Every share holder other than the payer owes the payer their share.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitEffect {
    pub payer_id: MemberId,
    pub shares: BTreeMap<MemberId, Money>,
}

impl SplitEffect {
    pub fn new(payer_id: MemberId, shares: BTreeMap<MemberId, Money>) -> Self {
        Self { payer_id, shares }
    }

    /// Debts created by this effect as `(debtor, creditor, amount)`
    pub fn debts(&self) -> impl Iterator<Item = (&MemberId, &MemberId, Money)> + '_ {
        self.shares
            .iter()
            .filter(move |(member, share)| *member != &self.payer_id && !share.is_zero())
            .map(move |(member, share)| (member, &self.payer_id, *share))
    }
}

/// Convert absolute shares back into percentages with two decimals
///
/// Works in basis points with the largest-remainder rule, so the result
/// always adds up to exactly 100.00. Ties go to the earlier member id.
pub fn percentages_from_shares(shares: &BTreeMap<MemberId, Money>) -> BTreeMap<MemberId, BigDecimal> {
    let total: Money = shares.values().sum();
    if !total.is_positive() {
        return BTreeMap::new();
    }
    let weights: Vec<BigDecimal> = shares.values().map(Money::to_decimal).collect();
    let points = largest_remainder(BASIS_POINTS, &weights);
    shares
        .keys()
        .cloned()
        .zip(points)
        .map(|(member, bp)| (member, BigDecimal::new(bp.into(), 2)))
        .collect()
}

impl Transaction {
    /// Percentages for pre-filling an edit form; percentage splits only
    pub fn percentages(&self) -> Option<BTreeMap<MemberId, BigDecimal>> {
        match (self.split_type, &self.split_details) {
            (SplitType::Percentage, Some(details)) => Some(percentages_from_shares(details)),
            _ => None,
        }
    }
}

/// Split-related errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SplitError {
    #[error("Amount must be positive, got {0}")]
    NonPositiveAmount(Money),
    #[error("Percentages must add up to 100, got {0}")]
    PercentageTotal(BigDecimal),
    #[error("Custom split amounts must add up to {expected}, got {actual}")]
    CustomSplitTotal { expected: Money, actual: Money },
    #[error("Payer must be a member of the group: {0}")]
    PayerNotInGroup(MemberId),
    #[error("Recipient must be a member of the group: {0}")]
    RecipientNotInGroup(MemberId),
    #[error("Cannot pay yourself")]
    SelfPayment,
    #[error("recipient_id required for payment type")]
    MissingRecipient,
    #[error("Split details required for {0} split")]
    MissingSplitDetails(SplitType),
    #[error("Split details are not accepted for {0} split")]
    UnexpectedSplitDetails(SplitType),
    #[error("Participants are only accepted for equal split, not {0}")]
    UnexpectedParticipants(SplitType),
    #[error("Split references a non-member: {0}")]
    UnknownMember(MemberId),
    #[error("Share cannot be negative for member {0}")]
    NegativeShare(MemberId),
    #[error("Equal split needs at least one participant")]
    NoParticipants,
    #[error("Participant listed more than once: {0}")]
    DuplicateParticipant(MemberId),
    #[error("Percentage for member {0} is too long or too finely scaled")]
    PercentageOutOfBounds(MemberId),
    #[error("Split amounts are too large to add up")]
    AmountOverflow,
}
