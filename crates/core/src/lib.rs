//! Core abstractions for the freezing core.
//!
//! This crate provides the seams between the freezing state machine and the
//! rest of a node:
//!
//! - [`Event`]: All possible inputs to the state machine
//! - [`Action`]: All possible outputs from the state machine
//! - [`EventPriority`]: Ordering priority for events at the same timestamp
//! - Collaborator traits ([`ChainView`], [`BlockScorer`], [`VoteTally`], ...)
//!   for the parts of the node the freezing core queries but does not own
//!
//! # Architecture
//!
//! ```text
//! Events → FreezeState::handle() → Actions
//! ```
//!
//! The state machine performs no network I/O. Votes to broadcast and blocks
//! to fetch come back as [`Action`]s; the runner (simulation or production)
//! executes them and feeds results back as [`Event`]s.

mod action;
mod event;
mod traits;

pub use action::Action;
pub use event::{Event, EventPriority};
pub use traits::{
    BalanceListProvider, BlockScorer, ChainError, ChainView, Clock, StorageError, SystemClock,
    VoteStorage, VoteTally,
};
