//! In-memory storage implementation for testing and single-process serving

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::ledger::BalanceLedger;
use crate::traits::*;
use crate::types::*;

/// In-memory storage implementation
///
/// Clones share the same underlying maps, so several managers can hold the
/// same store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    members: Arc<RwLock<HashMap<String, Member>>>,
    groups: Arc<RwLock<HashMap<String, Group>>>,
    transactions: Arc<RwLock<HashMap<String, Transaction>>>,
    ledgers: Arc<RwLock<HashMap<String, BalanceLedger>>>,
}

fn read<T>(lock: &RwLock<T>) -> LedgerResult<RwLockReadGuard<'_, T>> {
    lock.read()
        .map_err(|_| LedgerError::Storage("storage lock poisoned".to_string()))
}

fn write<T>(lock: &RwLock<T>) -> LedgerResult<RwLockWriteGuard<'_, T>> {
    lock.write()
        .map_err(|_| LedgerError::Storage("storage lock poisoned".to_string()))
}

impl MemoryStorage {
    /// Create a new memory storage instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear all data (useful for testing)
    pub fn clear(&self) -> LedgerResult<()> {
        write(&self.members)?.clear();
        write(&self.groups)?.clear();
        write(&self.transactions)?.clear();
        write(&self.ledgers)?.clear();
        Ok(())
    }
}

#[async_trait]
impl SplitStorage for MemoryStorage {
    async fn save_member(&mut self, member: &Member) -> LedgerResult<()> {
        write(&self.members)?.insert(member.id.clone(), member.clone());
        Ok(())
    }

    async fn get_member(&self, member_id: &str) -> LedgerResult<Option<Member>> {
        Ok(read(&self.members)?.get(member_id).cloned())
    }

    async fn find_member_by_username(&self, username: &str) -> LedgerResult<Option<Member>> {
        Ok(read(&self.members)?
            .values()
            .find(|m| m.username == username)
            .cloned())
    }

    async fn save_group(&mut self, group: &Group) -> LedgerResult<()> {
        write(&self.groups)?.insert(group.id.clone(), group.clone());
        Ok(())
    }

    async fn get_group(&self, group_id: &str) -> LedgerResult<Option<Group>> {
        Ok(read(&self.groups)?.get(group_id).cloned())
    }

    async fn list_groups(&self) -> LedgerResult<Vec<Group>> {
        let mut groups: Vec<Group> = read(&self.groups)?.values().cloned().collect();
        groups.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(groups)
    }

    async fn update_group(&mut self, group: &Group) -> LedgerResult<()> {
        let mut groups = write(&self.groups)?;
        match groups.get_mut(&group.id) {
            Some(stored) => {
                *stored = group.clone();
                Ok(())
            }
            None => Err(LedgerError::GroupNotFound(group.id.clone())),
        }
    }

    async fn save_transaction(&mut self, transaction: &Transaction) -> LedgerResult<()> {
        write(&self.transactions)?.insert(transaction.id.clone(), transaction.clone());
        Ok(())
    }

    async fn get_transaction(&self, transaction_id: &str) -> LedgerResult<Option<Transaction>> {
        Ok(read(&self.transactions)?.get(transaction_id).cloned())
    }

    async fn list_transactions(&self, group_id: &str) -> LedgerResult<Vec<Transaction>> {
        let mut transactions: Vec<Transaction> = read(&self.transactions)?
            .values()
            .filter(|txn| txn.group_id == group_id)
            .cloned()
            .collect();
        transactions.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(transactions)
    }

    async fn replace_transaction(
        &mut self,
        transaction: &Transaction,
        expected_version: u64,
    ) -> LedgerResult<()> {
        // Check and swap under one write guard.
        let mut transactions = write(&self.transactions)?;
        let stored = transactions
            .get_mut(&transaction.id)
            .ok_or_else(|| LedgerError::TransactionNotFound(transaction.id.clone()))?;

        if stored.version != expected_version {
            return Err(LedgerError::VersionConflict {
                transaction_id: transaction.id.clone(),
                expected: expected_version,
                actual: stored.version,
            });
        }

        *stored = transaction.clone();
        Ok(())
    }

    async fn delete_transaction(&mut self, transaction_id: &str) -> LedgerResult<()> {
        if write(&self.transactions)?.remove(transaction_id).is_some() {
            Ok(())
        } else {
            Err(LedgerError::TransactionNotFound(transaction_id.to_string()))
        }
    }

    async fn get_balance_ledger(&self, group_id: &str) -> LedgerResult<Option<BalanceLedger>> {
        Ok(read(&self.ledgers)?.get(group_id).cloned())
    }

    async fn save_balance_ledger(&mut self, ledger: &BalanceLedger) -> LedgerResult<()> {
        write(&self.ledgers)?.insert(ledger.group_id().to_string(), ledger.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::Money;

    fn transaction(id: &str, group_id: &str) -> Transaction {
        let now = chrono::Utc::now().naive_utc();
        Transaction {
            id: id.to_string(),
            group_id: group_id.to_string(),
            description: "Coffee".to_string(),
            amount: Money::from_minor_units(450),
            currency: GROUP_CURRENCY.to_string(),
            payer_id: "a".to_string(),
            split_type: SplitType::Equal,
            split_details: None,
            recipient_id: None,
            participants: vec!["a".to_string(), "b".to_string()],
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let mut storage = MemoryStorage::new();
        let reader = storage.clone();

        let member = Member::new("alice".to_string(), "Alice".to_string());
        storage.save_member(&member).await.unwrap();

        assert_eq!(reader.get_member(&member.id).await.unwrap(), Some(member.clone()));
        assert_eq!(
            reader.find_member_by_username("alice").await.unwrap(),
            Some(member)
        );
    }

    #[tokio::test]
    async fn test_list_transactions_filters_by_group() {
        let mut storage = MemoryStorage::new();
        storage.save_transaction(&transaction("t1", "g1")).await.unwrap();
        storage.save_transaction(&transaction("t2", "g2")).await.unwrap();
        storage.save_transaction(&transaction("t3", "g1")).await.unwrap();

        let listed = storage.list_transactions("g1").await.unwrap();
        let ids: Vec<&str> = listed.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&"t1"));
        assert!(ids.contains(&"t3"));
    }

    #[tokio::test]
    async fn test_replace_checks_version() {
        let mut storage = MemoryStorage::new();
        storage.save_transaction(&transaction("t1", "g1")).await.unwrap();

        let mut edited = transaction("t1", "g1");
        edited.version = 2;
        edited.description = "Tea".to_string();
        storage.replace_transaction(&edited, 1).await.unwrap();

        let mut stale = transaction("t1", "g1");
        stale.version = 2;
        let err = storage.replace_transaction(&stale, 1).await.unwrap_err();
        assert!(matches!(
            err,
            LedgerError::VersionConflict {
                expected: 1,
                actual: 2,
                ..
            }
        ));

        let stored = storage.get_transaction("t1").await.unwrap().unwrap();
        assert_eq!(stored.description, "Tea");
    }

    #[tokio::test]
    async fn test_delete_missing_transaction() {
        let mut storage = MemoryStorage::new();
        assert!(matches!(
            storage.delete_transaction("nope").await,
            Err(LedgerError::TransactionNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_update_unknown_group() {
        let mut storage = MemoryStorage::new();
        let group = Group::new("g".to_string(), vec!["a".to_string(), "b".to_string()]);
        assert!(matches!(
            storage.update_group(&group).await,
            Err(LedgerError::GroupNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_clear() {
        let mut storage = MemoryStorage::new();
        storage.save_transaction(&transaction("t1", "g1")).await.unwrap();
        storage.clear().unwrap();
        assert!(storage.get_transaction("t1").await.unwrap().is_none());
    }
}
