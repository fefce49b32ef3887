//! Collaborator seams the resolver drives.
//!
//! Each boundary dependency is a narrow injected trait so the resolver's
//! side effects stay mockable in tests and free of platform representation
//! details.

use crate::error::PropertyStoreError;
use guise_types::BuildField;

/// Source of the current process identity.
pub trait ProcessIdentity: Send + Sync {
    /// Name of the currently running process, if one is known.
    fn current_process_name(&self) -> Option<String>;
}

/// Read-only descriptors of the running hardware's real build.
pub trait BuildInfo: Send + Sync {
    /// The device codename property (e.g. `cheetah`).
    fn device_codename(&self) -> String;

    /// The real incremental build identifier.
    fn build_incremental(&self) -> String;

    /// The initial SDK level the device shipped with.
    fn initial_sdk_level(&self) -> i32;
}

/// The mutable identity property store.
///
/// Writes are best-effort and fire-and-forget from the resolver's point of
/// view: failures are logged, never retried or escalated.
pub trait PropertyStore: Send + Sync {
    /// Override a single build field.
    fn set_field(&self, field: BuildField, value: &str) -> Result<(), PropertyStoreError>;

    /// Rewrite the reported initial SDK level.
    fn set_initial_sdk_level(&self, level: i32) -> Result<(), PropertyStoreError>;
}
