//! Optimistic mutation core.
//!
//! A mutation changes local state immediately, then confirms the change with
//! the backend. If the backend refuses, the change is rolled back and the
//! error is handed to the caller.
//!
//! # Components
//!
//! - [`StateStore`] - Observable owner of one feature's domain state
//! - [`PendingKeys`] - Keys whose mutation is still waiting on the backend
//! - [`AuthResolver`] - Decides per attempt whether to call the backend at all
//! - [`MutationExecutor`] - Dedup, optimistic apply, remote call, rollback, cleanup
//! - [`TogglePair`] - Two symmetric operations (add/remove, like/unlike) on one executor
//!
//! # Per-key lifecycle
//!
//! ```text
//!            start (key not pending)
//!   Idle ─────────────────────────────▶ Pending
//!    ▲                                    │
//!    │  remote ok: keep optimistic value  │
//!    ├────────────────────────────────────┤
//!    │  remote err: apply rollback        │
//!    └────────────────────────────────────┘
//! ```
//!
//! A start attempt for a key that is already pending is rejected with
//! [`MutationOutcome::Deduplicated`] and leaves the in-flight mutation alone.

mod auth;
mod executor;
mod pending;
mod store;
mod toggle;

pub use auth::{AuthOutcome, AuthResolver, SessionAuth};
pub use executor::{Mutation, MutationExecutor, MutationOutcome};
pub use pending::PendingKeys;
pub use store::StateStore;
pub use toggle::{ToggleOperation, TogglePair, ToggleTemplate};
