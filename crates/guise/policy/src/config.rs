//! Externally supplied override configuration.
//!
//! Absent or empty values disable the corresponding branch; an empty
//! configuration is valid and never an error.

use serde::{Deserialize, Serialize};

/// Optional overrides controlling fingerprint selection and the photo-backup
/// client's profile choice.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverrideConfig {
    /// Fingerprint presented to privileged callers when configured.
    pub certified_fingerprint: String,

    /// Stock fingerprint presented to the AR core package when configured.
    pub stock_fingerprint: String,

    /// Present the legacy reference profile to the photo-backup client.
    pub legacy_photo_profile: bool,
}

impl OverrideConfig {
    /// The certified fingerprint override, if one is configured.
    pub fn certified_override(&self) -> Option<&str> {
        non_empty(&self.certified_fingerprint)
    }

    /// The stock fingerprint override, if one is configured.
    pub fn stock_override(&self) -> Option<&str> {
        non_empty(&self.stock_fingerprint)
    }
}

fn non_empty(value: &str) -> Option<&str> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}
