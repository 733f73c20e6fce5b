//! Traits for storage abstraction and extensibility

use async_trait::async_trait;

use crate::ledger::{BalanceLedger, GroupBalances};
use crate::publish::PublishError;
use crate::types::*;
use crate::utils::validation::*;

/// Storage abstraction for the split ledger
///
/// This trait allows the split ledger to work with any storage backend
/// (PostgreSQL, SQLite, a JSON file store, in-memory, etc.) by implementing
/// these methods.
#[async_trait]
pub trait SplitStorage: Send + Sync {
    /// Save a newly registered member
    async fn save_member(&mut self, member: &Member) -> LedgerResult<()>;

    /// Get a member by ID
    async fn get_member(&self, member_id: &str) -> LedgerResult<Option<Member>>;

    /// Get a member by username
    async fn find_member_by_username(&self, username: &str) -> LedgerResult<Option<Member>>;

    /// Save a new group
    async fn save_group(&mut self, group: &Group) -> LedgerResult<()>;

    /// Get a group by ID
    async fn get_group(&self, group_id: &str) -> LedgerResult<Option<Group>>;

    /// List all groups
    async fn list_groups(&self) -> LedgerResult<Vec<Group>>;

    /// Update group metadata (timestamps)
    async fn update_group(&mut self, group: &Group) -> LedgerResult<()>;

    /// Save a new transaction
    async fn save_transaction(&mut self, transaction: &Transaction) -> LedgerResult<()>;

    /// Get a transaction by ID
    async fn get_transaction(&self, transaction_id: &str) -> LedgerResult<Option<Transaction>>;

    /// List the transactions of a group, oldest first
    async fn list_transactions(&self, group_id: &str) -> LedgerResult<Vec<Transaction>>;

    /// Replace a stored transaction if it is still at `expected_version`
    ///
    /// Must fail with [`LedgerError::VersionConflict`] when the stored
    /// version differs, so two concurrent edits cannot both land.
    async fn replace_transaction(
        &mut self,
        transaction: &Transaction,
        expected_version: u64,
    ) -> LedgerResult<()>;

    /// Hard-delete a transaction
    async fn delete_transaction(&mut self, transaction_id: &str) -> LedgerResult<()>;

    /// Get the balance ledger of a group
    async fn get_balance_ledger(&self, group_id: &str) -> LedgerResult<Option<BalanceLedger>>;

    /// Save the balance ledger of a group
    async fn save_balance_ledger(&mut self, ledger: &BalanceLedger) -> LedgerResult<()>;
}

/// Trait for implementing custom group validation rules
pub trait GroupValidator: Send + Sync {
    /// Validate a member before registration
    fn validate_member(&self, member: &Member) -> LedgerResult<()>;

    /// Validate a group before saving
    fn validate_group(&self, group: &Group) -> LedgerResult<()>;
}

/// Trait for implementing custom transaction validation rules
pub trait TransactionValidator: Send + Sync {
    /// Validate the fields of a draft before it is resolved against a group
    fn validate_draft(&self, draft: &TransactionDraft) -> LedgerResult<()>;
}

/// Sink for group balances, notified after every change
///
/// Publishing happens while the ledger is held, so implementations must not
/// block. A failed publish is logged by the caller and never undoes the
/// change that triggered it.
pub trait BalancePublisher: Send + Sync {
    /// Announce a newly created group and its members
    fn announce_group(&self, group: &Group, members: &[Member]) -> Result<(), PublishError>;

    /// Publish the current balances of a group
    fn publish_balances(&self, balances: &GroupBalances) -> Result<(), PublishError>;
}

/// Default group validator with the field limits of the registry
pub struct DefaultGroupValidator;

impl GroupValidator for DefaultGroupValidator {
    fn validate_member(&self, member: &Member) -> LedgerResult<()> {
        validate_username(&member.username)?;
        validate_display_name(&member.display_name)
    }

    fn validate_group(&self, group: &Group) -> LedgerResult<()> {
        validate_group_name(&group.name)?;
        validate_member_list(&group.members)?;
        validate_currency(&group.currency)
    }
}

/// Default transaction validator
pub struct DefaultTransactionValidator;

impl TransactionValidator for DefaultTransactionValidator {
    fn validate_draft(&self, draft: &TransactionDraft) -> LedgerResult<()> {
        validate_transaction_description(&draft.description)?;
        validate_currency(&draft.currency)
    }
}
