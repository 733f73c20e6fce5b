//! Validation utilities

use std::collections::HashSet;

use crate::money::Money;
use crate::traits::*;
use crate::types::*;

/// Validate that an amount is positive
pub fn validate_positive_amount(amount: Money) -> LedgerResult<()> {
    if amount.is_positive() {
        Ok(())
    } else {
        Err(LedgerError::Validation(
            "Amount must be positive".to_string(),
        ))
    }
}

/// Validate a username: 3 to 50 characters of letters, digits, `-`, `_` or `.`
pub fn validate_username(username: &str) -> LedgerResult<()> {
    let length = username.chars().count();
    if !(3..=50).contains(&length) {
        return Err(LedgerError::Validation(
            "Username must be between 3 and 50 characters".to_string(),
        ));
    }

    if !username
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_' || c == '.')
    {
        return Err(LedgerError::Validation(
            "Username can only contain alphanumeric characters, dots, dashes, and underscores"
                .to_string(),
        ));
    }

    Ok(())
}

/// Validate a member display name
pub fn validate_display_name(name: &str) -> LedgerResult<()> {
    if name.trim().is_empty() {
        return Err(LedgerError::Validation(
            "Display name cannot be empty".to_string(),
        ));
    }

    if name.chars().count() > 100 {
        return Err(LedgerError::Validation(
            "Display name cannot exceed 100 characters".to_string(),
        ));
    }

    Ok(())
}

/// Validate a group name
pub fn validate_group_name(name: &str) -> LedgerResult<()> {
    if name.trim().is_empty() {
        return Err(LedgerError::Validation(
            "Group name cannot be empty".to_string(),
        ));
    }

    if name.chars().count() > 200 {
        return Err(LedgerError::Validation(
            "Group name cannot exceed 200 characters".to_string(),
        ));
    }

    Ok(())
}

/// Validate a group member list: at least two members, no repeats
pub fn validate_member_list(members: &[MemberId]) -> LedgerResult<()> {
    if members.len() < MIN_GROUP_MEMBERS {
        return Err(LedgerError::InsufficientMembers {
            count: members.len(),
        });
    }

    let mut seen = HashSet::new();
    for member in members {
        if !seen.insert(member.as_str()) {
            return Err(LedgerError::DuplicateMember(member.clone()));
        }
    }

    Ok(())
}

/// Validate that a currency is the group currency
pub fn validate_currency(currency: &str) -> LedgerResult<()> {
    if currency == GROUP_CURRENCY {
        Ok(())
    } else {
        Err(LedgerError::UnsupportedCurrency(currency.to_string()))
    }
}

/// Validate that a transaction description is valid
pub fn validate_transaction_description(description: &str) -> LedgerResult<()> {
    if description.trim().is_empty() {
        return Err(LedgerError::Validation(
            "Transaction description cannot be empty".to_string(),
        ));
    }

    if description.chars().count() > 500 {
        return Err(LedgerError::Validation(
            "Transaction description cannot exceed 500 characters".to_string(),
        ));
    }

    Ok(())
}

/// Transaction validator that also caps the amount of a single transaction
pub struct AmountLimitValidator {
    pub limit: Money,
}

impl AmountLimitValidator {
    pub fn new(limit: Money) -> Self {
        Self { limit }
    }
}

impl TransactionValidator for AmountLimitValidator {
    fn validate_draft(&self, draft: &TransactionDraft) -> LedgerResult<()> {
        DefaultTransactionValidator.validate_draft(draft)?;
        validate_positive_amount(draft.amount)?;

        if draft.amount > self.limit {
            return Err(LedgerError::Validation(format!(
                "Amount {} exceeds the limit of {}",
                draft.amount, self.limit
            )));
        }

        Ok(())
    }
}
