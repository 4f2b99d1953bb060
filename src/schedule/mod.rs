//! The schedule core: expands weekly rules into dated classes, reconciles
//! them with their persisted override rows and takes bookings.
//!
//! Everything here talks to persistence through [`crate::gateway::Gateway`] and holds no
//! state of its own.

pub mod admin;
pub mod booking;
pub mod capacity;
pub mod dates;
mod error;
pub mod materialize;
pub mod reconcile;

pub use admin::{
    cancel_instance, patch_instance, restore_instance, set_capacity_override, set_instance_note,
    toggle_override, CancelChange, InstancePatch, InstanceRef,
};
pub use booking::{book, book_with_id};
pub use error::ScheduleError;
pub use materialize::materialize;
pub use reconcile::resolve;

#[cfg(test)]
pub(crate) mod testing;
