//! # coordination
//!
//! Guards a remote record store against duplicate work coming from many
//! independent callers (screens, background refreshes, form submits).
//!
//! This library provides:
//! - [`FetchCoordinator`]: at most one outstanding read per coordinator.
//!   Callers asking for the key already in flight share its result, callers
//!   asking for any other key get `None` straight away.
//! - [`UpdateCoordinator`]: at most one outstanding write. Extra submits are
//!   rejected, records without an id never reach the store, and a safety
//!   timer releases the lock if the write hangs.
//! - [`Notifier`]: the sink that user-facing success/error messages go to.
//!
//! Nothing crosses the coordinator boundary as a panic or transport error:
//! fetches resolve to `Option`, submits to `Result<(), SubmitError>`.
//!
//! [`FetchCoordinator`]: crate::FetchCoordinator
//! [`UpdateCoordinator`]: crate::UpdateCoordinator
//! [`Notifier`]: crate::Notifier
#![warn(
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub,
    non_snake_case,
    non_upper_case_globals
)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod error;
pub mod fetch;
pub mod notify;
pub mod store;
mod timer;
pub mod update;

pub use error::SubmitError;
pub use fetch::FetchCoordinator;
pub use notify::{ChannelNotifier, Notification, NotifyKind, Notifier, TracingNotifier};
pub use store::{Key, Resource, Store};
pub use update::{Suppression, UpdateCoordinator};
