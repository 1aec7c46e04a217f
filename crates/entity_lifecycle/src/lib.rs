//! # Entity Lifecycle
//!
//! Persistent-entity lifecycle management: keeps a durable catalog of logical
//! entity records in step with their ephemeral live representations in a host
//! world, across restarts, concurrent spawn attempts, and host-side entity
//! persistence that silently drops plugin markers.
//!
//! The pieces, leaves first:
//!
//! - [`CatalogStore`] — JSON-file-backed record collection, rewritten
//!   wholesale and synchronously on every mutation.
//! - [`HandleRegistry`] — session-scoped map from record id to live
//!   [`host_api::EntityHandle`], re-validated on every read.
//! - [`Spawner`] — creates/destroys live entities for records, driven by a
//!   per-kind [`SpawnProfile`].
//! - [`Reconciler`] — scan/match/fill convergence on world or chunk load.

pub mod catalog;
pub mod error;
pub mod reconcile;
pub mod registry;
pub mod spawn;

pub use catalog::{CatalogRecord, CatalogStore};
pub use error::{
    CatalogError, CatalogResult, LifecycleError, LifecycleResult, SpawnError, SpawnResult,
};
pub use reconcile::{Reconciler, DEFAULT_POSITION_TOLERANCE};
pub use registry::HandleRegistry;
pub use spawn::{SpawnProfile, Spawner};

use uuid::Uuid;

/// Short random record id: the first 8 hex characters of a v4 UUID. Stable
/// for the record's lifetime and unique enough for catalogs of this size.
pub fn short_record_id() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_record_ids_are_eight_hex_chars() {
        let id = short_record_id();
        assert_eq!(id.len(), 8);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn short_record_ids_do_not_collide_trivially() {
        let a = short_record_id();
        let b = short_record_id();
        assert_ne!(a, b);
    }
}
