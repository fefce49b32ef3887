//! Guise Runtime - the caller-facing surface.
//!
//! Wires the profile table, override configuration, session state and the
//! injected platform collaborators behind the two entry points the platform
//! calls: [`IdentityRuntime::apply_identity_for`] once per process at
//! identity-setup time, and [`IdentityRuntime::authorize_attestation_chain`]
//! whenever an attestation certificate chain is about to be produced.

#![deny(unsafe_code)]

use guise_gate::{AttestationGate, CallStackInspector};
use guise_policy::resolver::PolicyResolver;
use guise_policy::traits::{BuildInfo, ProcessIdentity, PropertyStore};
use guise_policy::{IdentityDecision, OverrideConfig};
use guise_types::SessionState;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

pub use guise_gate::AttestationError;

/// Raised by the builder when a collaborator was not supplied.
#[derive(Debug, Error)]
pub enum RuntimeBuildError {
    #[error("missing collaborator: {name}")]
    MissingCollaborator { name: &'static str },
}

/// The assembled identity presentation engine.
#[derive(Debug)]
pub struct IdentityRuntime {
    resolver: PolicyResolver,
    gate: AttestationGate,
    session: Arc<SessionState>,
}

impl IdentityRuntime {
    pub fn builder() -> IdentityRuntimeBuilder {
        IdentityRuntimeBuilder::default()
    }

    /// Resolve and apply identity overrides for the package this process is
    /// about to run as.
    pub fn apply_identity_for(&self, package: &str) -> IdentityDecision {
        debug!(package, "resolving identity presentation");
        self.resolver.apply(package)
    }

    /// Allow or reject the attestation-chain request in flight. On `Err`,
    /// the caller must fail the request instead of returning certificates.
    pub fn authorize_attestation_chain(&self) -> Result<(), AttestationError> {
        self.gate.authorize()
    }

    /// The session flags shared by the resolver and the gate.
    pub fn session(&self) -> &SessionState {
        &self.session
    }
}

/// Builder collecting the configuration and platform collaborators.
#[derive(Default)]
pub struct IdentityRuntimeBuilder {
    config: OverrideConfig,
    session: Option<Arc<SessionState>>,
    process: Option<Arc<dyn ProcessIdentity>>,
    build: Option<Arc<dyn BuildInfo>>,
    store: Option<Arc<dyn PropertyStore>>,
    inspector: Option<Arc<dyn CallStackInspector>>,
}

impl IdentityRuntimeBuilder {
    pub fn with_config(mut self, config: OverrideConfig) -> Self {
        self.config = config;
        self
    }

    /// Share an externally owned session state (defaults to a fresh one).
    pub fn with_session(mut self, session: Arc<SessionState>) -> Self {
        self.session = Some(session);
        self
    }

    pub fn with_process_identity(mut self, process: Arc<dyn ProcessIdentity>) -> Self {
        self.process = Some(process);
        self
    }

    pub fn with_build_info(mut self, build: Arc<dyn BuildInfo>) -> Self {
        self.build = Some(build);
        self
    }

    pub fn with_property_store(mut self, store: Arc<dyn PropertyStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_stack_inspector(mut self, inspector: Arc<dyn CallStackInspector>) -> Self {
        self.inspector = Some(inspector);
        self
    }

    pub fn build(self) -> Result<IdentityRuntime, RuntimeBuildError> {
        let session = self.session.unwrap_or_default();
        let process = require(self.process, "process identity")?;
        let build = require(self.build, "build info")?;
        let store = require(self.store, "property store")?;
        let inspector = require(self.inspector, "call stack inspector")?;

        let resolver = PolicyResolver::new(
            self.config,
            Arc::clone(&session),
            process,
            build,
            store,
        );
        let gate = AttestationGate::new(Arc::clone(&session), inspector);

        Ok(IdentityRuntime {
            resolver,
            gate,
            session,
        })
    }
}

fn require<T>(value: Option<T>, name: &'static str) -> Result<T, RuntimeBuildError> {
    value.ok_or(RuntimeBuildError::MissingCollaborator { name })
}
