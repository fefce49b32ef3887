//! Guise Types - shared vocabulary for the identity presentation engine
//!
//! This crate centralizes the data model used by the policy resolver and the
//! attestation gate: the fixed build-field enumeration, identity profiles,
//! package classification, call-stack frame descriptors, and the per-process
//! session state shared between both components.

#![deny(unsafe_code)]

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

/// The fixed set of mutable build-identity fields.
///
/// These mirror the platform's build descriptor fields one-to-one; the
/// property store accepts writes only for this enumeration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BuildField {
    Brand,
    Manufacturer,
    Device,
    Product,
    Model,
    Fingerprint,
    Type,
}

impl BuildField {
    /// All fields in canonical order.
    pub const ALL: [BuildField; 7] = [
        BuildField::Brand,
        BuildField::Manufacturer,
        BuildField::Device,
        BuildField::Product,
        BuildField::Model,
        BuildField::Fingerprint,
        BuildField::Type,
    ];

    /// The platform field name (`BRAND`, `FINGERPRINT`, ...).
    pub fn name(&self) -> &'static str {
        match self {
            BuildField::Brand => "BRAND",
            BuildField::Manufacturer => "MANUFACTURER",
            BuildField::Device => "DEVICE",
            BuildField::Product => "PRODUCT",
            BuildField::Model => "MODEL",
            BuildField::Fingerprint => "FINGERPRINT",
            BuildField::Type => "TYPE",
        }
    }

    /// Parse a platform field name back into the enumeration.
    pub fn parse(name: &str) -> Result<Self, UnknownFieldError> {
        Self::ALL
            .iter()
            .copied()
            .find(|field| field.name() == name)
            .ok_or_else(|| UnknownFieldError {
                name: name.to_string(),
            })
    }
}

impl std::fmt::Display for BuildField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Error returned when a string does not name a known build field.
#[derive(Debug, Error)]
#[error("unknown build field: {name}")]
pub struct UnknownFieldError {
    pub name: String,
}

/// An immutable named mapping from build fields to presented values.
///
/// Field iteration order is deterministic so that repeated resolutions emit
/// identical command sequences.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityProfile {
    pub name: String,
    fields: BTreeMap<BuildField, String>,
}

impl IdentityProfile {
    /// Create an empty profile with the given display name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Add a field value (builder style).
    pub fn with_field(mut self, field: BuildField, value: impl Into<String>) -> Self {
        self.fields.insert(field, value.into());
        self
    }

    /// Look up the value presented for a field, if the profile defines one.
    pub fn get(&self, field: BuildField) -> Option<&str> {
        self.fields.get(&field).map(String::as_str)
    }

    /// Iterate fields in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = (BuildField, &str)> {
        self.fields.iter().map(|(field, value)| (*field, value.as_str()))
    }

    /// Number of fields the profile defines.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the profile defines no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Classification of a calling package. Exactly one class applies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackageClass {
    /// Never touched (explicit keep-list, or empty input).
    Exempt,
    /// The marketplace/installer client; flips a session flag, nothing else.
    StoreClient,
    /// Eligible for profile application.
    Targeted,
    /// Everything else; no action.
    Untargeted,
}

/// One frame of a call stack, as supplied by the injected inspector.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackFrame {
    /// Name of the originating component for this frame.
    pub component: String,
}

impl StackFrame {
    pub fn new(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
        }
    }
}

/// Per-process session flags shared by the resolver and the attestation gate.
///
/// Both flags are monotonic: they transition false -> true at most once per
/// process lifetime and are never cleared. Release/acquire ordering is all
/// the cross-thread visibility the gate needs.
#[derive(Debug, Default)]
pub struct SessionState {
    unstable_gms: AtomicBool,
    store_client: AtomicBool,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that this process is the unstable Google-services process.
    pub fn note_unstable_gms(&self) {
        self.unstable_gms.store(true, Ordering::Release);
    }

    /// Record that this process is the store client.
    pub fn note_store_client(&self) {
        self.store_client.store(true, Ordering::Release);
    }

    pub fn is_unstable_gms(&self) -> bool {
        self.unstable_gms.load(Ordering::Acquire)
    }

    pub fn is_store_client(&self) -> bool {
        self.store_client.load(Ordering::Acquire)
    }
}
