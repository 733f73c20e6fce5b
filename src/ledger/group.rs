//! Member registry and group management

use log::info;

use crate::ledger::BalanceLedger;
use crate::traits::*;
use crate::types::*;

/// Group manager for registering members and creating groups
pub struct GroupManager<S: SplitStorage> {
    pub(crate) storage: S,
    validator: Box<dyn GroupValidator>,
}

impl<S: SplitStorage> GroupManager<S> {
    /// Create a new group manager
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            validator: Box::new(DefaultGroupValidator),
        }
    }

    /// Create a new group manager with custom validator
    pub fn with_validator(storage: S, validator: Box<dyn GroupValidator>) -> Self {
        Self { storage, validator }
    }

    /// Register a new member
    pub async fn register_member(
        &mut self,
        username: String,
        display_name: String,
    ) -> LedgerResult<Member> {
        let member = Member::new(username, display_name);
        self.validator.validate_member(&member)?;

        if self
            .storage
            .find_member_by_username(&member.username)
            .await?
            .is_some()
        {
            return Err(LedgerError::DuplicateUsername(member.username));
        }

        self.storage.save_member(&member).await?;
        info!("Registered member {} ({})", member.username, member.id);

        Ok(member)
    }

    /// Get a member by ID
    pub async fn get_member(&self, member_id: &str) -> LedgerResult<Option<Member>> {
        self.storage.get_member(member_id).await
    }

    /// Create a group; every member must already be registered
    pub async fn create_group(
        &mut self,
        name: String,
        members: Vec<MemberId>,
    ) -> LedgerResult<Group> {
        let group = Group::new(name, members);
        self.validator.validate_group(&group)?;

        for member_id in &group.members {
            if self.storage.get_member(member_id).await?.is_none() {
                return Err(LedgerError::MemberNotFound(member_id.clone()));
            }
        }

        self.storage.save_group(&group).await?;
        self.storage
            .save_balance_ledger(&BalanceLedger::new(group.id.clone()))
            .await?;
        info!(
            "Created group {} '{}' with {} members",
            group.id,
            group.name,
            group.members.len()
        );

        Ok(group)
    }

    /// Get a group by ID
    pub async fn get_group(&self, group_id: &str) -> LedgerResult<Option<Group>> {
        self.storage.get_group(group_id).await
    }

    /// Get a group by ID, returning an error if not found
    pub async fn get_group_required(&self, group_id: &str) -> LedgerResult<Group> {
        self.storage
            .get_group(group_id)
            .await?
            .ok_or_else(|| LedgerError::GroupNotFound(group_id.to_string()))
    }

    /// List all groups, oldest first
    pub async fn list_groups(&self) -> LedgerResult<Vec<Group>> {
        self.storage.list_groups().await
    }

    /// Stamp a group as modified
    pub async fn touch_group(&mut self, group_id: &str) -> LedgerResult<Group> {
        let mut group = self.get_group_required(group_id).await?;
        group.touch();
        self.storage.update_group(&group).await?;
        Ok(group)
    }
}
