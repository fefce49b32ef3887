//! Guise Policy - the identity override policy engine
//!
//! Decides, per requesting package, which identity-field overrides to present
//! and which fingerprint-selection rule wins. The resolver consults the
//! static profile table and the shared session state, then emits fire-and-
//! forget override commands to the injected property store.

#![deny(unsafe_code)]

pub mod config;
pub mod decision;
pub mod error;
pub mod resolver;
pub mod tables;
pub mod traits;

pub use config::OverrideConfig;
pub use decision::{FingerprintSelection, IdentityDecision};
pub use error::PropertyStoreError;
pub use resolver::PolicyResolver;
pub use tables::ProfileTable;
pub use traits::{BuildInfo, ProcessIdentity, PropertyStore};
