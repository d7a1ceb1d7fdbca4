//! Rill engines: own the sequence counter and subscriber registry and run
//! the emission algorithm.
//!
//! Emission, for both variants:
//! 1. take the next sequence under the rill's exclusion,
//! 2. call `on_new` on a snapshot of the consumers, collecting errors,
//! 3. with no errors call `on_succeeded` on all of them, otherwise call
//!    `on_failed` with the aggregated failure.
//!
//! Errors raised during step 3 are returned to the emitter. A handled
//! `on_new` failure is not: the event was still emitted.

mod concurrent;
mod state;
mod sync;

pub use self::concurrent::AsyncRill;
pub use self::state::{Emission, RillStatus};
pub use self::sync::SyncRill;
