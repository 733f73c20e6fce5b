//! Pushing group balances to outside subscribers
//!
//! [`LogPublisher`] is the default and only writes to the log.
//! [`MqttPublisher`] feeds Home Assistant over MQTT.

pub mod mqtt;

pub use mqtt::*;

use log::debug;

use crate::ledger::GroupBalances;
use crate::traits::BalancePublisher;
use crate::types::{Group, Member};

/// Publishing errors
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("Failed to encode payload: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("Publisher unavailable: {0}")]
    Unavailable(String),
}

/// Publisher that only logs what it would send
#[derive(Debug, Clone, Copy, Default)]
pub struct LogPublisher;

impl BalancePublisher for LogPublisher {
    fn announce_group(&self, group: &Group, members: &[Member]) -> Result<(), PublishError> {
        debug!(
            "Group {} ({}) created with {} members",
            group.id,
            group.name,
            members.len()
        );
        Ok(())
    }

    fn publish_balances(&self, balances: &GroupBalances) -> Result<(), PublishError> {
        debug!(
            "Group {} now has {} open debts",
            balances.group_id,
            balances.debts.len()
        );
        Ok(())
    }
}
