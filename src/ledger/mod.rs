//! Ledger module containing group management, transaction processing and balances

pub mod balance;
pub mod core;
pub mod group;
pub mod transaction;

pub use balance::*;
pub use core::*;
pub use group::*;
pub use transaction::*;
