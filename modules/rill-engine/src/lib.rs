//! Rill engine.
//!
//! A rill assigns strictly increasing sequences to the events emitted into
//! it and fans them out to subscribed consumers, which then learn whether
//! every consumer handled the event or at least one failed. Two variants:
//! `SyncRill` runs consumers on the emitting thread, `AsyncRill` awaits async
//! consumers under a bounded, cancellable lock.
//!
//! Operators (`map`, `filter`, `of_type`, `catch`) compose in front of a
//! consumer without breaking that protocol. `RillTransaction` stages what a
//! rill emits and appends it to a `RillStore` as one commit.

pub mod config;
pub mod consumer;
pub mod error;
pub mod operators;
pub mod rills;
pub mod subscription;
pub mod transaction;

pub use config::RillConfig;
pub use consumer::{AsyncDelegatingConsumer, AsyncRillConsumer, DelegatingConsumer, RillConsumer};
pub use error::{ConsumerFailures, RillError, TransactionError};
pub use operators::{AsyncConsumable, AsyncConsumableExt, Consumable, ConsumableExt};
pub use rills::{AsyncRill, Emission, RillStatus, SyncRill};
pub use subscription::Subscription;
pub use transaction::{RillTransaction, Stager, StagingSource};
