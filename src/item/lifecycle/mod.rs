//! Item lifecycle: soft delete, recovery and purge of expired deletions.

pub mod purge;
mod soft_delete;

pub use purge::{purge_expired, PurgeReport};
pub use soft_delete::SoftDeletable;
