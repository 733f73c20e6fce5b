//! # Split Ledger
//!
//! Shared-expense splitting with pairwise balances for groups of people.
//!
//! ## Features
//!
//! - **Split resolution**: equal, percentage, custom and payment splits, resolved to exact cents
//! - **Pairwise balances**: who owes whom within a group, kept in step with every edit
//! - **Optimistic editing**: versioned transactions with compare-and-swap replacement
//! - **Storage abstraction**: database-agnostic design with trait-based storage
//! - **JSON API**: actix-web routes with `{detail}` error bodies
//! - **Balance publishing**: Home Assistant sensors over MQTT, or the log by default
//!
//! ## Quick Start
//!
//! ```rust
//! use split_ledger::{MemoryStorage, SplitLedger, TransactionBuilder, Money};
//!
//! # block_on(async {
//! let mut ledger = SplitLedger::new(MemoryStorage::new());
//! let alice = ledger.register_member("alice".into(), "Alice".into()).await?;
//! let bob = ledger.register_member("bob".into(), "Bob".into()).await?;
//! let group = ledger
//!     .create_group("Trip".into(), vec![alice.id.clone(), bob.id.clone()])
//!     .await?;
//!
//! let draft = TransactionBuilder::new("Dinner".into(), Money::from_minor_units(3000), alice.id.clone())
//!     .equal()
//!     .build()?;
//! ledger.record_transaction(&group.id, draft).await?;
//!
//! assert_eq!(
//!     ledger.balance_between(&group.id, &bob.id, &alice.id).await?,
//!     Money::from_minor_units(1500)
//! );
//! # Ok::<(), split_ledger::LedgerError>(())
//! # }).unwrap();
//! # fn block_on<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Runtime::new().unwrap().block_on(f)
//! # }
//! ```

pub mod config;
pub mod http;
pub mod ledger;
pub mod money;
pub mod publish;
pub mod split;
pub mod traits;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use ledger::*;
pub use money::Money;
pub use publish::{LogPublisher, MqttPublisher, PublishError};
pub use split::{SplitEffect, SplitError, SplitResolver};
pub use traits::*;
pub use types::*;
pub use utils::MemoryStorage;

// Re-export transaction patterns for convenience
pub use ledger::transaction::patterns;
