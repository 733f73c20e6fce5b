//! Main ledger orchestrator that coordinates groups, transactions and balances

use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::ledger::{BalanceLedger, GroupManager, PairBalance, TransactionManager};
use crate::money::Money;
use crate::publish::LogPublisher;
use crate::traits::*;
use crate::types::*;

/// Balances of a group as seen by its members
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupBalances {
    pub group_id: String,
    pub currency: String,
    /// Net position per member, positive when the member is owed money
    pub net: BTreeMap<MemberId, Money>,
    /// Outstanding pairwise debts
    pub debts: Vec<PairBalance>,
}

impl GroupBalances {
    fn from_ledger(group: &Group, ledger: &BalanceLedger) -> Self {
        Self {
            group_id: group.id.clone(),
            currency: group.currency.clone(),
            net: ledger.net_positions(&group.members),
            debts: ledger.debts(),
        }
    }
}

/// Result of recording or editing a transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionOutcome {
    pub transaction: Transaction,
    pub balances: GroupBalances,
}

/// Result of deleting a transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeletionOutcome {
    pub transaction_id: String,
    pub group_id: String,
    pub balances: GroupBalances,
}

/// Report on the consistency of a group's stored balances
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceIntegrityReport {
    pub group_id: String,
    pub is_valid: bool,
    pub issues: Vec<String>,
    /// Sum of all net positions; zero for a healthy group
    pub net_total: Money,
}

/// Main split ledger that orchestrates members, groups and transactions
///
/// After every group creation and transaction change the new balances go to
/// the configured [`BalancePublisher`].
pub struct SplitLedger<S: SplitStorage> {
    group_manager: GroupManager<S>,
    transaction_manager: TransactionManager<S>,
    publisher: Box<dyn BalancePublisher>,
}

impl<S: SplitStorage + Clone> SplitLedger<S> {
    /// Create a new split ledger with the given storage backend
    pub fn new(storage: S) -> Self {
        Self {
            group_manager: GroupManager::new(storage.clone()),
            transaction_manager: TransactionManager::new(storage),
            publisher: Box::new(LogPublisher),
        }
    }

    /// Send balance updates to `publisher` instead of the log
    pub fn with_publisher(mut self, publisher: Box<dyn BalancePublisher>) -> Self {
        self.publisher = publisher;
        self
    }

    /// Create a new split ledger with custom validators
    pub fn with_validators(
        storage: S,
        group_validator: Box<dyn GroupValidator>,
        transaction_validator: Box<dyn TransactionValidator>,
    ) -> Self {
        Self {
            group_manager: GroupManager::with_validator(storage.clone(), group_validator),
            transaction_manager: TransactionManager::with_validator(storage, transaction_validator),
            publisher: Box::new(LogPublisher),
        }
    }

    // Member and group operations
    /// Register a new member
    pub async fn register_member(
        &mut self,
        username: String,
        display_name: String,
    ) -> LedgerResult<Member> {
        self.group_manager
            .register_member(username, display_name)
            .await
    }

    /// Get a member by ID
    pub async fn get_member(&self, member_id: &str) -> LedgerResult<Option<Member>> {
        self.group_manager.get_member(member_id).await
    }

    /// Create a new group of registered members
    pub async fn create_group(
        &mut self,
        name: String,
        members: Vec<MemberId>,
    ) -> LedgerResult<Group> {
        let group = self.group_manager.create_group(name, members).await?;
        self.announce(&group).await?;
        Ok(group)
    }

    /// Get a group by ID
    pub async fn get_group(&self, group_id: &str) -> LedgerResult<Option<Group>> {
        self.group_manager.get_group(group_id).await
    }

    /// List all groups
    pub async fn list_groups(&self) -> LedgerResult<Vec<Group>> {
        self.group_manager.list_groups().await
    }

    // Transaction operations
    /// Record a new transaction in a group
    pub async fn record_transaction(
        &mut self,
        group_id: &str,
        draft: TransactionDraft,
    ) -> LedgerResult<TransactionOutcome> {
        let (transaction, ledger) = self
            .transaction_manager
            .record_transaction(group_id, draft)
            .await?;
        let group = self.group_manager.touch_group(group_id).await?;
        let balances = GroupBalances::from_ledger(&group, &ledger);
        self.publish(&balances);

        Ok(TransactionOutcome {
            balances,
            transaction,
        })
    }

    /// Replace a transaction, optionally checking the version being edited
    pub async fn update_transaction(
        &mut self,
        transaction_id: &str,
        draft: TransactionDraft,
        expected_version: Option<u64>,
    ) -> LedgerResult<TransactionOutcome> {
        let (transaction, ledger) = self
            .transaction_manager
            .update_transaction(transaction_id, draft, expected_version)
            .await?;
        let group = self
            .group_manager
            .touch_group(&transaction.group_id)
            .await?;
        let balances = GroupBalances::from_ledger(&group, &ledger);
        self.publish(&balances);

        Ok(TransactionOutcome {
            balances,
            transaction,
        })
    }

    /// Delete a transaction
    pub async fn delete_transaction(&mut self, transaction_id: &str) -> LedgerResult<DeletionOutcome> {
        let (transaction, ledger) = self
            .transaction_manager
            .delete_transaction(transaction_id)
            .await?;
        let group = self
            .group_manager
            .touch_group(&transaction.group_id)
            .await?;
        let balances = GroupBalances::from_ledger(&group, &ledger);
        self.publish(&balances);

        Ok(DeletionOutcome {
            transaction_id: transaction.id,
            balances,
            group_id: group.id,
        })
    }

    /// Get a transaction by ID
    pub async fn get_transaction(&self, transaction_id: &str) -> LedgerResult<Option<Transaction>> {
        self.transaction_manager
            .get_transaction(transaction_id)
            .await
    }

    /// Transactions of a group, oldest first
    pub async fn list_transactions(&self, group_id: &str) -> LedgerResult<Vec<Transaction>> {
        self.transaction_manager.list_transactions(group_id).await
    }

    // Balance operations
    /// Current balances of a group
    pub async fn group_balances(&self, group_id: &str) -> LedgerResult<GroupBalances> {
        let group = self.group_manager.get_group_required(group_id).await?;
        let ledger = self.transaction_manager.load_ledger(group_id).await?;
        Ok(GroupBalances::from_ledger(&group, &ledger))
    }

    /// Net amount `debtor` owes `creditor` in a group; negative when reversed
    pub async fn balance_between(
        &self,
        group_id: &str,
        debtor: &str,
        creditor: &str,
    ) -> LedgerResult<Money> {
        let group = self.group_manager.get_group_required(group_id).await?;
        for member_id in [debtor, creditor] {
            if !group.has_member(member_id) {
                return Err(LedgerError::MemberNotFound(member_id.to_string()));
            }
        }
        let ledger = self.transaction_manager.load_ledger(group_id).await?;
        Ok(ledger.balance(debtor, creditor))
    }

    /// Announce every group and publish its current balances
    ///
    /// Used at startup so subscribers see groups that already exist.
    pub async fn publish_all(&self) -> LedgerResult<usize> {
        let groups = self.group_manager.list_groups().await?;
        for group in &groups {
            self.announce(group).await?;
        }
        info!("Published balances of {} groups", groups.len());
        Ok(groups.len())
    }

    async fn announce(&self, group: &Group) -> LedgerResult<()> {
        let mut members = Vec::with_capacity(group.members.len());
        for member_id in &group.members {
            if let Some(member) = self.group_manager.get_member(member_id).await? {
                members.push(member);
            }
        }
        if let Err(e) = self.publisher.announce_group(group, &members) {
            warn!("Failed to announce group {}: {}", group.id, e);
        }
        let balances = self.group_balances(&group.id).await?;
        self.publish(&balances);
        Ok(())
    }

    fn publish(&self, balances: &GroupBalances) {
        if let Err(e) = self.publisher.publish_balances(balances) {
            warn!(
                "Failed to publish balances of group {}: {}",
                balances.group_id, e
            );
        }
    }

    /// Check the stored balances of a group against its transaction log
    pub async fn verify_balances(&self, group_id: &str) -> LedgerResult<BalanceIntegrityReport> {
        let group = self.group_manager.get_group_required(group_id).await?;
        let stored = self.transaction_manager.load_ledger(group_id).await?;
        let rebuilt = self.transaction_manager.rebuild_ledger(group_id).await?;

        let mut issues = Vec::new();

        if !stored.same_balances(&rebuilt) {
            issues.push("Stored balances differ from the transaction log".to_string());
        }

        if stored.applied_count() != rebuilt.applied_count() {
            issues.push(format!(
                "Stored balances cover {} transactions, the log has {}",
                stored.applied_count(),
                rebuilt.applied_count()
            ));
        }

        let net = stored.net_positions(&group.members);
        let net_total = match Money::checked_sum(net.values()) {
            Some(total) => total,
            None => {
                issues.push("Net positions overflow when added up".to_string());
                Money::ZERO
            }
        };
        if !net_total.is_zero() {
            issues.push(format!("Net positions add up to {}, not 0.00", net_total));
        }

        for member_id in net.keys() {
            if !group.has_member(member_id) {
                issues.push(format!("Balance held by non-member {}", member_id));
            }
        }

        if issues.is_empty() {
            info!("Balances of group {} verified", group_id);
        } else {
            warn!(
                "Balances of group {} failed verification: {}",
                group_id,
                issues.join("; ")
            );
        }

        Ok(BalanceIntegrityReport {
            group_id: group.id,
            is_valid: issues.is_empty(),
            issues,
            net_total,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::transaction::patterns;
    use crate::publish::PublishError;
    use crate::utils::memory_storage::MemoryStorage;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone, PartialEq)]
    enum Published {
        Announced { group_id: String, names: Vec<String> },
        Balances(GroupBalances),
    }

    #[derive(Clone, Default)]
    struct RecordingPublisher {
        sent: Arc<Mutex<Vec<Published>>>,
    }

    impl RecordingPublisher {
        fn take(&self) -> Vec<Published> {
            std::mem::take(&mut *self.sent.lock().unwrap())
        }
    }

    impl BalancePublisher for RecordingPublisher {
        fn announce_group(&self, group: &Group, members: &[Member]) -> Result<(), PublishError> {
            self.sent.lock().unwrap().push(Published::Announced {
                group_id: group.id.clone(),
                names: members.iter().map(|m| m.display_name.clone()).collect(),
            });
            Ok(())
        }

        fn publish_balances(&self, balances: &GroupBalances) -> Result<(), PublishError> {
            self.sent
                .lock()
                .unwrap()
                .push(Published::Balances(balances.clone()));
            Ok(())
        }
    }

    struct BrokenPublisher;

    impl BalancePublisher for BrokenPublisher {
        fn announce_group(&self, _: &Group, _: &[Member]) -> Result<(), PublishError> {
            Err(PublishError::Unavailable("broker down".to_string()))
        }

        fn publish_balances(&self, _: &GroupBalances) -> Result<(), PublishError> {
            Err(PublishError::Unavailable("broker down".to_string()))
        }
    }

    fn cents(c: i64) -> Money {
        Money::from_minor_units(c)
    }

    async fn ledger_with_group() -> (SplitLedger<MemoryStorage>, Group) {
        let mut ledger = SplitLedger::new(MemoryStorage::new());
        let mut ids = Vec::new();
        for name in ["alice", "bob", "carol"] {
            let member = ledger
                .register_member(name.to_string(), name.to_string())
                .await
                .unwrap();
            ids.push(member.id);
        }
        let group = ledger.create_group("Flat".to_string(), ids).await.unwrap();
        (ledger, group)
    }

    #[tokio::test]
    async fn test_split_ledger_basic_operations() {
        let (mut ledger, group) = ledger_with_group().await;
        let [a, b, c] = [&group.members[0], &group.members[1], &group.members[2]];

        let draft = patterns::shared_expense("Groceries".to_string(), cents(3000), a.clone()).unwrap();
        let outcome = ledger.record_transaction(&group.id, draft).await.unwrap();

        assert_eq!(outcome.balances.net[a], cents(2000));
        assert_eq!(outcome.balances.net[b], cents(-1000));
        assert_eq!(outcome.balances.net[c], cents(-1000));
        assert_eq!(outcome.balances.debts.len(), 2);

        assert_eq!(ledger.balance_between(&group.id, b, a).await.unwrap(), cents(1000));
        assert_eq!(ledger.balance_between(&group.id, a, b).await.unwrap(), cents(-1000));

        let stored = ledger.get_group(&group.id).await.unwrap().unwrap();
        assert!(stored.updated_at >= group.updated_at);
    }

    #[tokio::test]
    async fn test_balance_between_rejects_non_members() {
        let (ledger, group) = ledger_with_group().await;
        assert!(matches!(
            ledger
                .balance_between(&group.id, &group.members[0], "stranger")
                .await,
            Err(LedgerError::MemberNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_outcome_reports_refreshed_balances() {
        let (mut ledger, group) = ledger_with_group().await;
        let draft =
            patterns::shared_expense("Groceries".to_string(), cents(3000), group.members[0].clone())
                .unwrap();
        let outcome = ledger.record_transaction(&group.id, draft).await.unwrap();

        let deleted = ledger
            .delete_transaction(&outcome.transaction.id)
            .await
            .unwrap();
        assert_eq!(deleted.transaction_id, outcome.transaction.id);
        assert_eq!(deleted.group_id, group.id);
        assert!(deleted.balances.debts.is_empty());
        assert!(deleted.balances.net.values().all(Money::is_zero));
    }

    #[tokio::test]
    async fn test_verify_balances() {
        let (mut ledger, group) = ledger_with_group().await;
        let draft =
            patterns::shared_expense("Groceries".to_string(), cents(1001), group.members[1].clone())
                .unwrap();
        ledger.record_transaction(&group.id, draft).await.unwrap();

        let report = ledger.verify_balances(&group.id).await.unwrap();
        assert!(report.is_valid, "issues: {:?}", report.issues);
        assert_eq!(report.net_total, Money::ZERO);
    }

    #[tokio::test]
    async fn test_list_transactions_unknown_group() {
        let (ledger, _) = ledger_with_group().await;
        assert!(matches!(
            ledger.list_transactions("nope").await,
            Err(LedgerError::GroupNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_every_change_publishes_balances() {
        let publisher = RecordingPublisher::default();
        let mut ledger =
            SplitLedger::new(MemoryStorage::new()).with_publisher(Box::new(publisher.clone()));
        let alice = ledger
            .register_member("alice".to_string(), "Alice".to_string())
            .await
            .unwrap();
        let bob = ledger
            .register_member("bob".to_string(), "Bob".to_string())
            .await
            .unwrap();
        let group = ledger
            .create_group("Flat".to_string(), vec![alice.id.clone(), bob.id.clone()])
            .await
            .unwrap();

        let sent = publisher.take();
        assert_eq!(sent.len(), 2);
        assert_eq!(
            sent[0],
            Published::Announced {
                group_id: group.id.clone(),
                names: vec!["Alice".to_string(), "Bob".to_string()],
            }
        );
        match &sent[1] {
            Published::Balances(balances) => {
                assert_eq!(balances.net.len(), 2);
                assert!(balances.net.values().all(Money::is_zero));
            }
            other => panic!("expected balances, got {:?}", other),
        }

        let draft = patterns::shared_expense("Dinner".to_string(), cents(3000), alice.id.clone())
            .unwrap();
        let recorded = ledger.record_transaction(&group.id, draft).await.unwrap();
        assert_eq!(publisher.take(), vec![Published::Balances(recorded.balances)]);

        let edit = patterns::settle_up(bob.id.clone(), alice.id.clone(), cents(500)).unwrap();
        let updated = ledger
            .update_transaction(&recorded.transaction.id, edit, None)
            .await
            .unwrap();
        assert_eq!(publisher.take(), vec![Published::Balances(updated.balances)]);

        let deleted = ledger
            .delete_transaction(&recorded.transaction.id)
            .await
            .unwrap();
        assert_eq!(publisher.take(), vec![Published::Balances(deleted.balances)]);

        // Rejected changes publish nothing
        let bad = patterns::settle_up(bob.id.clone(), bob.id.clone(), cents(500)).unwrap();
        assert!(ledger.record_transaction(&group.id, bad).await.is_err());
        assert!(publisher.take().is_empty());

        assert_eq!(ledger.publish_all().await.unwrap(), 1);
        assert_eq!(publisher.take().len(), 2);
    }

    #[tokio::test]
    async fn test_publisher_failure_does_not_fail_changes() {
        let mut ledger =
            SplitLedger::new(MemoryStorage::new()).with_publisher(Box::new(BrokenPublisher));
        let a = ledger
            .register_member("alice".to_string(), "Alice".to_string())
            .await
            .unwrap();
        let b = ledger
            .register_member("bob".to_string(), "Bob".to_string())
            .await
            .unwrap();
        let group = ledger
            .create_group("Flat".to_string(), vec![a.id.clone(), b.id.clone()])
            .await
            .unwrap();

        let draft = patterns::shared_expense("Dinner".to_string(), cents(3000), a.id).unwrap();
        let outcome = ledger.record_transaction(&group.id, draft).await.unwrap();
        assert_eq!(outcome.balances.debts.len(), 1);
        assert_eq!(ledger.list_transactions(&group.id).await.unwrap().len(), 1);
    }
}
