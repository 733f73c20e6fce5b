//! Pairwise balance ledger for a group

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::money::Money;
use crate::split::SplitEffect;
use crate::types::{LedgerError, LedgerResult, MemberId};

/// Amount one member owes another, always positive
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairBalance {
    pub debtor: MemberId,
    pub creditor: MemberId,
    pub amount: Money,
}

/// Running pairwise balances of a group
///
/// Each unordered pair is stored once under `(lower id, higher id)` with the
/// amount the lower id owes the higher id, which keeps
/// `balance(a, b) == -balance(b, a)` by construction. The effect applied for
/// every transaction id is remembered, so re-applying an id replaces its
/// previous effect instead of adding to it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BalanceLedger {
    group_id: String,
    pairs: BTreeMap<(MemberId, MemberId), Money>,
    applied: BTreeMap<String, SplitEffect>,
}

impl BalanceLedger {
    /// Create an empty ledger for a group
    pub fn new(group_id: String) -> Self {
        Self {
            group_id,
            pairs: BTreeMap::new(),
            applied: BTreeMap::new(),
        }
    }

    /// Recompute a ledger from a transaction log
    pub fn rebuild<I>(group_id: String, effects: I) -> LedgerResult<Self>
    where
        I: IntoIterator<Item = (String, SplitEffect)>,
    {
        let mut ledger = Self::new(group_id);
        for (transaction_id, effect) in effects {
            ledger.apply(&transaction_id, effect)?;
        }
        Ok(ledger)
    }

    pub fn group_id(&self) -> &str {
        &self.group_id
    }

    /// Apply the effect of a transaction, replacing any earlier effect
    /// recorded for the same id. Returns the replaced effect.
    ///
    /// Fails with [`LedgerError::BalanceOverflow`] and leaves the ledger
    /// untouched if a pair balance or net position would overflow.
    pub fn apply(
        &mut self,
        transaction_id: &str,
        effect: SplitEffect,
    ) -> LedgerResult<Option<SplitEffect>> {
        let previous = self.applied.get(transaction_id);
        let mut pairs = self.pairs.clone();
        if let Some(previous) = previous {
            self.post(&mut pairs, previous, true)?;
        }
        self.post(&mut pairs, &effect, false)?;
        self.commit(pairs)?;

        debug!(
            "Applied transaction {} to group {} ledger",
            transaction_id, self.group_id
        );
        Ok(self.applied.insert(transaction_id.to_string(), effect))
    }

    /// Remove the effect of a transaction. Returns it if it was applied.
    pub fn revert(&mut self, transaction_id: &str) -> LedgerResult<Option<SplitEffect>> {
        let Some(effect) = self.applied.get(transaction_id) else {
            return Ok(None);
        };
        let mut pairs = self.pairs.clone();
        self.post(&mut pairs, effect, true)?;
        self.commit(pairs)?;

        debug!(
            "Reverted transaction {} from group {} ledger",
            transaction_id, self.group_id
        );
        Ok(self.applied.remove(transaction_id))
    }

    pub fn is_applied(&self, transaction_id: &str) -> bool {
        self.applied.contains_key(transaction_id)
    }

    /// Effect currently recorded for a transaction
    pub fn applied_effect(&self, transaction_id: &str) -> Option<&SplitEffect> {
        self.applied.get(transaction_id)
    }

    pub fn applied_count(&self) -> usize {
        self.applied.len()
    }

    /// Net amount `a` owes `b`; negative when `b` owes `a`
    pub fn balance(&self, a: &str, b: &str) -> Money {
        if a == b {
            return Money::ZERO;
        }
        let (key, sign) = Self::key(a, b);
        let amount = self.pairs.get(&key).copied().unwrap_or(Money::ZERO);
        if sign {
            amount
        } else {
            -amount
        }
    }

    /// Net position per member: positive when the member is owed money
    pub fn net_positions(&self, members: &[MemberId]) -> BTreeMap<MemberId, Money> {
        let mut positions: BTreeMap<MemberId, Money> =
            members.iter().map(|m| (m.clone(), Money::ZERO)).collect();
        // Committed pairs always have in-range nets, see `commit`
        for ((lower, higher), amount) in &self.pairs {
            let owed = positions.entry(higher.clone()).or_default();
            *owed = owed.saturating_add(*amount);
            let owing = positions.entry(lower.clone()).or_default();
            *owing = owing.saturating_sub(*amount);
        }
        positions
    }

    /// All outstanding debts, oriented from debtor to creditor
    pub fn debts(&self) -> Vec<PairBalance> {
        self.pairs
            .iter()
            .filter(|(_, amount)| !amount.is_zero())
            .map(|((lower, higher), amount)| {
                if amount.is_positive() {
                    PairBalance {
                        debtor: lower.clone(),
                        creditor: higher.clone(),
                        amount: *amount,
                    }
                } else {
                    PairBalance {
                        debtor: higher.clone(),
                        creditor: lower.clone(),
                        amount: amount.abs(),
                    }
                }
            })
            .collect()
    }

    /// Whether the pairwise amounts match another ledger, ignoring settled pairs
    pub fn same_balances(&self, other: &BalanceLedger) -> bool {
        self.debts() == other.debts()
    }

    fn post(
        &self,
        pairs: &mut BTreeMap<(MemberId, MemberId), Money>,
        effect: &SplitEffect,
        reverse: bool,
    ) -> LedgerResult<()> {
        for (debtor, creditor, amount) in effect.debts() {
            let (key, sign) = Self::key(debtor, creditor);
            let entry = pairs.entry(key).or_default();
            let next = if sign != reverse {
                entry.checked_add(amount)
            } else {
                entry.checked_sub(amount)
            };
            *entry = next.ok_or_else(|| self.overflow())?;
        }
        pairs.retain(|_, amount| !amount.is_zero());
        Ok(())
    }

    /// Install `pairs` once every member's net position fits in range
    fn commit(&mut self, pairs: BTreeMap<(MemberId, MemberId), Money>) -> LedgerResult<()> {
        {
            let mut nets: BTreeMap<&MemberId, Money> = BTreeMap::new();
            for ((lower, higher), amount) in &pairs {
                let owed = nets.entry(higher).or_default();
                *owed = owed.checked_add(*amount).ok_or_else(|| self.overflow())?;
                let owing = nets.entry(lower).or_default();
                *owing = owing.checked_sub(*amount).ok_or_else(|| self.overflow())?;
            }
        }
        self.pairs = pairs;
        Ok(())
    }

    fn overflow(&self) -> LedgerError {
        warn!("Balance overflow in group {}", self.group_id);
        LedgerError::BalanceOverflow(self.group_id.clone())
    }

    /// Canonical key for a pair and whether `(a, b)` is already in key order
    fn key(a: &str, b: &str) -> ((MemberId, MemberId), bool) {
        if a < b {
            ((a.to_string(), b.to_string()), true)
        } else {
            ((b.to_string(), a.to_string()), false)
        }
    }
}
