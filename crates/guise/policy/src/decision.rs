//! Structured summary of one identity resolution.
//!
//! The decision card reports what the resolver did; the authoritative side
//! effects are the commands already sent to the property store.

use guise_types::{BuildField, PackageClass};
use serde::{Deserialize, Serialize};

/// Which fingerprint-selection rule won. Exactly one outcome per resolution.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FingerprintSelection {
    /// The configured certified fingerprint was presented.
    Certified,
    /// The configured stock fingerprint was presented.
    Stock,
    /// The legacy reference device fallback was presented.
    LegacyFallback,
    /// No fingerprint rule fired.
    Unchanged,
}

/// Outcome card for a single `apply` invocation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IdentityDecision {
    pub package: String,
    pub classification: PackageClass,

    /// Name of the profile that was resolved, if any.
    pub profile: Option<String>,

    /// Fields overridden during the per-field loop.
    pub fields_overridden: Vec<BuildField>,

    /// Fields the suppression table kept untouched during the loop.
    pub fields_suppressed: Vec<BuildField>,

    pub fingerprint: FingerprintSelection,

    /// The value the initial SDK level was rewritten to, if it was.
    pub sdk_level_rewritten: Option<i32>,

    /// Whether the real incremental build identifier was presented as the
    /// final FINGERPRINT (indexing-service rule).
    pub real_build_fingerprint: bool,
}

impl IdentityDecision {
    pub(crate) fn new(package: &str, classification: PackageClass) -> Self {
        Self {
            package: package.to_string(),
            classification,
            profile: None,
            fields_overridden: Vec::new(),
            fields_suppressed: Vec::new(),
            fingerprint: FingerprintSelection::Unchanged,
            sdk_level_rewritten: None,
            real_build_fingerprint: false,
        }
    }

    /// Whether the resolution changed nothing visible to the caller.
    pub fn is_noop(&self) -> bool {
        self.fields_overridden.is_empty()
            && self.fingerprint == FingerprintSelection::Unchanged
            && self.sdk_level_rewritten.is_none()
            && !self.real_build_fingerprint
    }
}
