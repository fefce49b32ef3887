//! Guise Gate - decides whether an attestation certificate chain may be
//! issued to the current caller.
//!
//! The gate reads the shared session flags and, for the Google-services
//! case, walks the injected call stack looking for the integrity-
//! verification component. A blocked caller gets a hard failure; the real
//! attestation flow must not proceed.

#![deny(unsafe_code)]

use guise_types::{SessionState, StackFrame};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// Substring identifying integrity/safety verification frames on the stack.
pub const INTEGRITY_STACK_MARKER: &str = "DroidGuard";

/// Supplies the call stack of the currently executing thread.
///
/// Implemented by the platform; tests inject fixed frame lists.
pub trait CallStackInspector: Send + Sync {
    /// Ordered frames, innermost first.
    fn frames(&self) -> Vec<StackFrame>;
}

/// The deliberate policy-denied outcome. Callers must surface this as an
/// unsupported-operation failure, never return certificate data.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AttestationError {
    #[error(
        "key attestation blocked (unstable_gms={unstable_gms}, store_client={store_client})"
    )]
    Blocked {
        unstable_gms: bool,
        store_client: bool,
    },
}

/// Gate over attestation-chain issuance.
pub struct AttestationGate {
    session: Arc<SessionState>,
    inspector: Arc<dyn CallStackInspector>,
}

impl std::fmt::Debug for AttestationGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttestationGate")
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

impl AttestationGate {
    pub fn new(session: Arc<SessionState>, inspector: Arc<dyn CallStackInspector>) -> Self {
        Self { session, inspector }
    }

    /// Whether the current caller is disallowed from obtaining a chain.
    pub fn is_blocked(&self) -> bool {
        self.session.is_store_client()
            || (self.session.is_unstable_gms() && self.stack_has_integrity_check())
    }

    /// Allow or reject the attestation-chain request that is about to run.
    pub fn authorize(&self) -> Result<(), AttestationError> {
        if self.is_blocked() {
            let store_client = self.session.is_store_client();
            let unstable_gms = self.session.is_unstable_gms();
            info!(unstable_gms, store_client, "blocked key attestation");
            return Err(AttestationError::Blocked {
                unstable_gms,
                store_client,
            });
        }
        Ok(())
    }

    fn stack_has_integrity_check(&self) -> bool {
        self.inspector
            .frames()
            .iter()
            .any(|frame| frame.component.contains(INTEGRITY_STACK_MARKER))
    }
}
