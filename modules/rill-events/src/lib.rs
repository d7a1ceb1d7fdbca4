//! Value model and persistence boundary for rills.
//!
//! Sequences, identities, timestamps, the event envelope and commits, plus the
//! `RillStore` contract that persistence backends implement. No dispatch
//! logic lives here; see `rill-engine` for that.

pub mod commit;
pub mod error;
pub mod event;
pub mod ids;
pub mod memory;
pub mod reference;
pub mod sequence;
pub mod store;
pub mod timestamp;

pub use commit::{Commit, RillDetails};
pub use error::{ModelError, StoreError};
pub use event::{AnyContent, Event};
pub use ids::{CommitId, EventId};
pub use memory::InMemoryRillStore;
pub use reference::RillReference;
pub use sequence::{Sequence, SequenceRange};
pub use store::{CommitStream, RillStore};
pub use timestamp::Timestamp;
