//! Error types for property-store writes.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failures reported by the external identity property store.
///
/// None of these are fatal to a resolution: the resolver logs the failed
/// write and continues with the remaining fields.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PropertyStoreError {
    /// The store does not recognize the field.
    #[error("unknown build field: {field}")]
    UnknownField { field: String },

    /// The store refused or could not perform the write.
    #[error("property write rejected: {reason}")]
    WriteRejected { reason: String },
}
