//! Transaction processing and management

use bigdecimal::BigDecimal;
use log::{info, warn};
use std::collections::BTreeMap;

use crate::ledger::BalanceLedger;
use crate::money::Money;
use crate::split::{effect_of, SplitResolver};
use crate::traits::*;
use crate::types::*;
use crate::utils::validation::validate_positive_amount;

/// Transaction manager for recording, editing and deleting transactions
///
/// Every mutation keeps the stored [`BalanceLedger`] of the group in step
/// with the transaction log and hands the updated ledger back.
pub struct TransactionManager<S: SplitStorage> {
    storage: S,
    validator: Box<dyn TransactionValidator>,
}

impl<S: SplitStorage> TransactionManager<S> {
    /// Create a new transaction manager
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            validator: Box::new(DefaultTransactionValidator),
        }
    }

    /// Create a new transaction manager with custom validator
    pub fn with_validator(storage: S, validator: Box<dyn TransactionValidator>) -> Self {
        Self { storage, validator }
    }

    /// Record a new transaction in a group
    pub async fn record_transaction(
        &mut self,
        group_id: &str,
        draft: TransactionDraft,
    ) -> LedgerResult<(Transaction, BalanceLedger)> {
        let group = self.group_required(group_id).await?;
        self.check_draft(&group, &draft)?;

        let resolved = SplitResolver::new(&group).resolve(draft.amount, &draft.payer_id, &draft.split)?;
        let now = chrono::Utc::now().naive_utc();
        let transaction = Transaction {
            id: uuid::Uuid::new_v4().to_string(),
            group_id: group.id.clone(),
            description: draft.description,
            amount: draft.amount,
            currency: draft.currency,
            payer_id: draft.payer_id,
            split_type: resolved.split_type,
            split_details: resolved.split_details.clone(),
            recipient_id: resolved.recipient_id.clone(),
            participants: resolved.participants.clone(),
            version: 1,
            created_at: now,
            updated_at: now,
        };

        // Balances are updated in memory first so a rejected effect stores nothing
        let mut ledger = self.load_ledger(&group.id).await?;
        ledger.apply(&transaction.id, resolved.effect(&transaction.payer_id))?;

        self.storage.save_transaction(&transaction).await?;
        self.storage.save_balance_ledger(&ledger).await?;

        info!(
            "Recorded {} transaction {} of {} in group {}",
            transaction.split_type, transaction.id, transaction.amount, group.id
        );

        Ok((transaction, ledger))
    }

    /// Get a transaction by ID
    pub async fn get_transaction(&self, transaction_id: &str) -> LedgerResult<Option<Transaction>> {
        self.storage.get_transaction(transaction_id).await
    }

    /// Get a transaction by ID, returning an error if not found
    pub async fn get_transaction_required(
        &self,
        transaction_id: &str,
    ) -> LedgerResult<Transaction> {
        self.storage
            .get_transaction(transaction_id)
            .await?
            .ok_or_else(|| LedgerError::TransactionNotFound(transaction_id.to_string()))
    }

    /// Transactions of a group, oldest first
    pub async fn list_transactions(&self, group_id: &str) -> LedgerResult<Vec<Transaction>> {
        self.group_required(group_id).await?;
        self.storage.list_transactions(group_id).await
    }

    /// Replace a transaction with a new draft
    ///
    /// When `expected_version` is given it must match the stored version.
    /// The old balance effect is reverted and the new one applied under the
    /// same transaction id.
    pub async fn update_transaction(
        &mut self,
        transaction_id: &str,
        draft: TransactionDraft,
        expected_version: Option<u64>,
    ) -> LedgerResult<(Transaction, BalanceLedger)> {
        let existing = self.get_transaction_required(transaction_id).await?;
        let expected = expected_version.unwrap_or(existing.version);
        if expected != existing.version {
            warn!(
                "Rejected stale edit of transaction {}: version {} is not {}",
                transaction_id, expected, existing.version
            );
            return Err(LedgerError::VersionConflict {
                transaction_id: transaction_id.to_string(),
                expected,
                actual: existing.version,
            });
        }

        let group = self.group_required(&existing.group_id).await?;
        self.check_draft(&group, &draft)?;

        let resolved = SplitResolver::new(&group).resolve(draft.amount, &draft.payer_id, &draft.split)?;
        let updated = Transaction {
            id: existing.id.clone(),
            group_id: existing.group_id.clone(),
            description: draft.description,
            amount: draft.amount,
            currency: draft.currency,
            payer_id: draft.payer_id,
            split_type: resolved.split_type,
            split_details: resolved.split_details.clone(),
            recipient_id: resolved.recipient_id.clone(),
            participants: resolved.participants.clone(),
            version: existing.version + 1,
            created_at: existing.created_at,
            updated_at: chrono::Utc::now().naive_utc(),
        };

        let mut ledger = self.load_ledger(&group.id).await?;
        ledger.apply(&updated.id, resolved.effect(&updated.payer_id))?;

        self.storage.replace_transaction(&updated, expected).await?;
        self.storage.save_balance_ledger(&ledger).await?;

        info!(
            "Updated transaction {} in group {} to version {}",
            updated.id, group.id, updated.version
        );

        Ok((updated, ledger))
    }

    /// Hard-delete a transaction and revert its balance effect
    pub async fn delete_transaction(
        &mut self,
        transaction_id: &str,
    ) -> LedgerResult<(Transaction, BalanceLedger)> {
        let transaction = self.get_transaction_required(transaction_id).await?;
        let mut ledger = self.load_ledger(&transaction.group_id).await?;

        if ledger.revert(transaction_id)?.is_none() {
            warn!(
                "Transaction {} had no recorded effect in group {}",
                transaction_id, transaction.group_id
            );
        }

        self.storage.delete_transaction(transaction_id).await?;
        self.storage.save_balance_ledger(&ledger).await?;

        info!(
            "Deleted transaction {} from group {}",
            transaction_id, transaction.group_id
        );

        Ok((transaction, ledger))
    }

    /// Stored ledger of a group, rebuilt from the log if it is missing
    pub async fn load_ledger(&self, group_id: &str) -> LedgerResult<BalanceLedger> {
        match self.storage.get_balance_ledger(group_id).await? {
            Some(ledger) => Ok(ledger),
            None => {
                warn!("No stored ledger for group {}, rebuilding", group_id);
                self.rebuild_ledger(group_id).await
            }
        }
    }

    /// Recompute the ledger of a group from its transaction log
    pub async fn rebuild_ledger(&self, group_id: &str) -> LedgerResult<BalanceLedger> {
        let transactions = self.storage.list_transactions(group_id).await?;
        BalanceLedger::rebuild(
            group_id.to_string(),
            transactions
                .iter()
                .map(|txn| (txn.id.clone(), effect_of(txn))),
        )
    }

    async fn group_required(&self, group_id: &str) -> LedgerResult<Group> {
        self.storage
            .get_group(group_id)
            .await?
            .ok_or_else(|| LedgerError::GroupNotFound(group_id.to_string()))
    }

    fn check_draft(&self, group: &Group, draft: &TransactionDraft) -> LedgerResult<()> {
        self.validator.validate_draft(draft)?;
        if draft.currency != group.currency {
            return Err(LedgerError::UnsupportedCurrency(draft.currency.clone()));
        }
        Ok(())
    }
}

/// Builder for transaction drafts
#[derive(Debug)]
pub struct TransactionBuilder {
    description: String,
    amount: Money,
    payer_id: MemberId,
    currency: String,
    split: Option<SplitSpec>,
}

impl TransactionBuilder {
    /// Start a draft paid by `payer_id`
    pub fn new(description: String, amount: Money, payer_id: MemberId) -> Self {
        Self {
            description,
            amount,
            payer_id,
            currency: GROUP_CURRENCY.to_string(),
            split: None,
        }
    }

    pub fn currency(mut self, currency: String) -> Self {
        self.currency = currency;
        self
    }

    /// Split evenly across the whole group
    pub fn equal(mut self) -> Self {
        self.split = Some(SplitSpec::Equal { participants: None });
        self
    }

    /// Split evenly across some members only
    pub fn equal_among(mut self, participants: Vec<MemberId>) -> Self {
        self.split = Some(SplitSpec::Equal {
            participants: Some(participants),
        });
        self
    }

    /// Give a member a percentage of the amount
    pub fn percentage(mut self, member_id: MemberId, percent: BigDecimal) -> Self {
        let mut percentages = match self.split.take() {
            Some(SplitSpec::Percentage(existing)) => existing,
            _ => BTreeMap::new(),
        };
        percentages.insert(member_id, percent);
        self.split = Some(SplitSpec::Percentage(percentages));
        self
    }

    /// Give a member an absolute share of the amount
    pub fn custom(mut self, member_id: MemberId, share: Money) -> Self {
        let mut amounts = match self.split.take() {
            Some(SplitSpec::Custom(existing)) => existing,
            _ => BTreeMap::new(),
        };
        amounts.insert(member_id, share);
        self.split = Some(SplitSpec::Custom(amounts));
        self
    }

    /// Make the draft a direct payment to `recipient_id`
    pub fn payment_to(mut self, recipient_id: MemberId) -> Self {
        self.split = Some(SplitSpec::Payment { recipient_id });
        self
    }

    /// Build the draft
    pub fn build(self) -> LedgerResult<TransactionDraft> {
        validate_positive_amount(self.amount)?;
        let split = self.split.ok_or_else(|| {
            LedgerError::Validation("A split strategy is required".to_string())
        })?;

        Ok(TransactionDraft {
            description: self.description,
            amount: self.amount,
            payer_id: self.payer_id,
            currency: self.currency,
            split,
        })
    }
}

/// Common transaction patterns
pub mod patterns {
    use super::*;

    /// Shared expense split evenly across the whole group
    pub fn shared_expense(
        description: String,
        amount: Money,
        payer_id: MemberId,
    ) -> LedgerResult<TransactionDraft> {
        TransactionBuilder::new(description, amount, payer_id)
            .equal()
            .build()
    }

    /// Pay back a debt directly
    pub fn settle_up(
        payer_id: MemberId,
        recipient_id: MemberId,
        amount: Money,
    ) -> LedgerResult<TransactionDraft> {
        TransactionBuilder::new("Settle up".to_string(), amount, payer_id)
            .payment_to(recipient_id)
            .build()
    }
}
