//! The policy resolver: one end-to-end identity decision per package.

use crate::config::OverrideConfig;
use crate::decision::{FingerprintSelection, IdentityDecision};
use crate::tables::{
    LEGACY_FALLBACK_FINGERPRINT, PACKAGE_AR_CORE, PACKAGE_GMS, PACKAGE_SETTINGS_INTELLIGENCE,
    PROCESS_GMS_UNSTABLE, ProfileTable, SDK_INT_N_MR1, SDK_INT_S,
};
use crate::traits::{BuildInfo, ProcessIdentity, PropertyStore};
use guise_types::{BuildField, PackageClass, SessionState};
use std::sync::Arc;
use tracing::{debug, warn};

/// Orchestrates one identity resolution: classification, profile field
/// overrides, session flags, fingerprint selection, SDK rewrites.
///
/// Runs once per process at identity-setup time. Every store write is
/// fire-and-forget; a failed write is logged and the remaining fields are
/// still attempted.
pub struct PolicyResolver {
    table: ProfileTable,
    config: OverrideConfig,
    session: Arc<SessionState>,
    process: Arc<dyn ProcessIdentity>,
    build: Arc<dyn BuildInfo>,
    store: Arc<dyn PropertyStore>,
}

impl std::fmt::Debug for PolicyResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyResolver")
            .field("table", &self.table)
            .field("config", &self.config)
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

impl PolicyResolver {
    pub fn new(
        config: OverrideConfig,
        session: Arc<SessionState>,
        process: Arc<dyn ProcessIdentity>,
        build: Arc<dyn BuildInfo>,
        store: Arc<dyn PropertyStore>,
    ) -> Self {
        Self {
            table: ProfileTable::new(),
            config,
            session,
            process,
            build,
            store,
        }
    }

    /// Resolve and apply the identity overrides for `package`.
    pub fn apply(&self, package: &str) -> IdentityDecision {
        let classification = self.table.classify(package);
        let mut decision = IdentityDecision::new(package, classification);

        match classification {
            PackageClass::Exempt | PackageClass::Untargeted => return decision,
            PackageClass::StoreClient => {
                self.session.note_store_client();
                return decision;
            }
            PackageClass::Targeted => {}
        }

        let on_reference_device = self
            .table
            .is_reference_device(&self.build.device_codename());

        if let Some(profile) = self
            .table
            .profile_for(package, on_reference_device, &self.config)
        {
            decision.profile = Some(profile.name.clone());
            // On a reference device the fields already match; the whole loop
            // is skipped, not individual fields.
            if !on_reference_device {
                debug!(package, profile = profile.name.as_str(), "presenting identity profile");
                let suppressed = self.table.suppressed_fields(package);
                for (field, value) in profile.iter() {
                    if suppressed.contains(&field) {
                        debug!(package, field = %field, "field suppressed for package");
                        decision.fields_suppressed.push(field);
                        continue;
                    }
                    self.set_field(field, value);
                    decision.fields_overridden.push(field);
                }
            }
        }

        if package == PACKAGE_GMS
            && self.process.current_process_name().as_deref() == Some(PROCESS_GMS_UNSTABLE)
        {
            self.session.note_unstable_gms();
        }

        let unstable_gms = self.session.is_unstable_gms();
        let store_client = self.session.is_store_client();

        // Fingerprint selection: exactly one branch fires. The suppression
        // table never applies past this point, only inside the field loop.
        let mut fallback_used = false;
        if let Some(fingerprint) = self
            .config
            .certified_override()
            .filter(|_| unstable_gms || store_client)
        {
            debug!(package, "presenting certified fingerprint");
            self.set_field(BuildField::Fingerprint, fingerprint);
            decision.fingerprint = FingerprintSelection::Certified;
        } else if let Some(fingerprint) = self
            .config
            .stock_override()
            .filter(|_| package == PACKAGE_AR_CORE)
        {
            debug!(package, "presenting stock fingerprint");
            self.set_field(BuildField::Fingerprint, fingerprint);
            decision.fingerprint = FingerprintSelection::Stock;
        } else if unstable_gms {
            debug!(package, "presenting legacy reference fingerprint");
            self.set_field(BuildField::Fingerprint, LEGACY_FALLBACK_FINGERPRINT);
            self.set_field(BuildField::Product, "marlin");
            self.set_field(BuildField::Device, "marlin");
            self.set_field(BuildField::Model, "Pixel XL");
            self.set_initial_sdk_level(SDK_INT_N_MR1);
            self.set_field(BuildField::Type, "userdebug");
            decision.fingerprint = FingerprintSelection::LegacyFallback;
            decision.sdk_level_rewritten = Some(SDK_INT_N_MR1);
            fallback_used = true;
        }

        // Keep newer-SDK-gated behavior from activating under the emulated
        // identity.
        if !fallback_used && unstable_gms && self.build.initial_sdk_level() > SDK_INT_S {
            debug!(package, level = SDK_INT_S, "clamping initial sdk level");
            self.set_initial_sdk_level(SDK_INT_S);
            decision.sdk_level_rewritten = Some(SDK_INT_S);
        }

        // The indexing service must always reflect true build provenance in
        // its FINGERPRINT, whatever the profile logic produced.
        if package == PACKAGE_SETTINGS_INTELLIGENCE {
            let incremental = self.build.build_incremental();
            self.set_field(BuildField::Fingerprint, &incremental);
            decision.real_build_fingerprint = true;
        }

        decision
    }

    fn set_field(&self, field: BuildField, value: &str) {
        debug!(field = %field, value, "overriding build field");
        if let Err(error) = self.store.set_field(field, value) {
            warn!(field = %field, value, %error, "build field override failed");
        }
    }

    fn set_initial_sdk_level(&self, level: i32) {
        if let Err(error) = self.store.set_initial_sdk_level(level) {
            warn!(level, %error, "initial sdk level rewrite failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PropertyStoreError;
    use crate::tables::{PACKAGE_PHOTOS, PACKAGE_STORE_CLIENT};
    use std::sync::Mutex;

    #[derive(Clone, Debug, PartialEq, Eq)]
    enum Command {
        Field(BuildField, String),
        SdkLevel(i32),
    }

    #[derive(Default)]
    struct RecordingStore {
        commands: Mutex<Vec<Command>>,
        fail_fields: Vec<BuildField>,
    }

    impl RecordingStore {
        fn failing_on(fields: &[BuildField]) -> Self {
            Self {
                commands: Mutex::new(Vec::new()),
                fail_fields: fields.to_vec(),
            }
        }

        fn commands(&self) -> Vec<Command> {
            self.commands.lock().unwrap().clone()
        }
    }

    impl PropertyStore for RecordingStore {
        fn set_field(&self, field: BuildField, value: &str) -> Result<(), PropertyStoreError> {
            if self.fail_fields.contains(&field) {
                return Err(PropertyStoreError::WriteRejected {
                    reason: "store rejected write".to_string(),
                });
            }
            self.commands
                .lock()
                .unwrap()
                .push(Command::Field(field, value.to_string()));
            Ok(())
        }

        fn set_initial_sdk_level(&self, level: i32) -> Result<(), PropertyStoreError> {
            self.commands.lock().unwrap().push(Command::SdkLevel(level));
            Ok(())
        }
    }

    struct FixedProcess(Option<&'static str>);

    impl ProcessIdentity for FixedProcess {
        fn current_process_name(&self) -> Option<String> {
            self.0.map(str::to_string)
        }
    }

    struct FixedBuild {
        codename: &'static str,
        incremental: &'static str,
        initial_sdk: i32,
    }

    impl Default for FixedBuild {
        fn default() -> Self {
            Self {
                codename: "generic",
                incremental: "9163457",
                initial_sdk: 33,
            }
        }
    }

    impl BuildInfo for FixedBuild {
        fn device_codename(&self) -> String {
            self.codename.to_string()
        }

        fn build_incremental(&self) -> String {
            self.incremental.to_string()
        }

        fn initial_sdk_level(&self) -> i32 {
            self.initial_sdk
        }
    }

    struct Harness {
        resolver: PolicyResolver,
        session: Arc<SessionState>,
        store: Arc<RecordingStore>,
    }

    fn harness(config: OverrideConfig, process: FixedProcess, build: FixedBuild) -> Harness {
        harness_with_store(config, process, build, RecordingStore::default())
    }

    fn harness_with_store(
        config: OverrideConfig,
        process: FixedProcess,
        build: FixedBuild,
        store: RecordingStore,
    ) -> Harness {
        let session = Arc::new(SessionState::new());
        let store = Arc::new(store);
        let resolver = PolicyResolver::new(
            config,
            Arc::clone(&session),
            Arc::new(process),
            Arc::new(build),
            Arc::clone(&store) as Arc<dyn PropertyStore>,
        );
        Harness {
            resolver,
            session,
            store,
        }
    }

    fn field(field: BuildField, value: &str) -> Command {
        Command::Field(field, value.to_string())
    }

    #[test]
    fn exempt_packages_emit_nothing_and_touch_no_flags() {
        let h = harness(
            OverrideConfig::default(),
            FixedProcess(None),
            FixedBuild::default(),
        );
        let decision = h.resolver.apply("com.google.android.dialer");

        assert_eq!(decision.classification, PackageClass::Exempt);
        assert!(decision.is_noop());
        assert!(h.store.commands().is_empty());
        assert!(!h.session.is_unstable_gms());
        assert!(!h.session.is_store_client());
    }

    #[test]
    fn store_client_only_flips_its_flag() {
        let h = harness(
            OverrideConfig::default(),
            FixedProcess(None),
            FixedBuild::default(),
        );
        let decision = h.resolver.apply(PACKAGE_STORE_CLIENT);

        assert_eq!(decision.classification, PackageClass::StoreClient);
        assert!(h.store.commands().is_empty());
        assert!(h.session.is_store_client());
        assert!(!h.session.is_unstable_gms());
    }

    #[test]
    fn untargeted_packages_are_untouched() {
        let h = harness(
            OverrideConfig::default(),
            FixedProcess(None),
            FixedBuild::default(),
        );
        let decision = h.resolver.apply("org.mozilla.firefox");

        assert_eq!(decision.classification, PackageClass::Untargeted);
        assert!(decision.is_noop());
        assert!(h.store.commands().is_empty());
    }

    #[test]
    fn targeted_package_receives_the_full_profile() {
        let h = harness(
            OverrideConfig::default(),
            FixedProcess(None),
            FixedBuild::default(),
        );
        let decision = h.resolver.apply("com.google.android.deskclock");

        assert_eq!(decision.profile.as_deref(), Some("Pixel 7 Pro"));
        assert_eq!(
            h.store.commands(),
            vec![
                field(BuildField::Brand, "google"),
                field(BuildField::Manufacturer, "Google"),
                field(BuildField::Device, "cheetah"),
                field(BuildField::Product, "cheetah"),
                field(BuildField::Model, "Pixel 7 Pro"),
                field(
                    BuildField::Fingerprint,
                    "google/cheetah/cheetah:13/TQ2A.230505.002/9891397:user/release-keys"
                ),
            ]
        );
        assert_eq!(decision.fingerprint, FingerprintSelection::Unchanged);
    }

    #[test]
    fn reference_hardware_skips_the_whole_field_loop() {
        let h = harness(
            OverrideConfig::default(),
            FixedProcess(None),
            FixedBuild {
                codename: "cheetah",
                ..Default::default()
            },
        );
        let decision = h.resolver.apply("com.google.android.deskclock");

        // Profile resolves but the loop is skipped per classification.
        assert_eq!(decision.profile.as_deref(), Some("Pixel 7 Pro"));
        assert!(decision.fields_overridden.is_empty());
        assert!(h.store.commands().is_empty());
    }

    #[test]
    fn repeated_resolution_emits_an_identical_command_sequence() {
        let h = harness(
            OverrideConfig::default(),
            FixedProcess(None),
            FixedBuild::default(),
        );
        h.resolver.apply("com.google.android.deskclock");
        let first = h.store.commands();

        h.resolver.apply("com.google.android.deskclock");
        let all = h.store.commands();
        assert_eq!(all.len(), first.len() * 2);
        assert_eq!(&all[first.len()..], first.as_slice());
    }

    #[test]
    fn store_failures_do_not_stop_the_remaining_fields() {
        let h = harness_with_store(
            OverrideConfig::default(),
            FixedProcess(None),
            FixedBuild::default(),
            RecordingStore::failing_on(&[BuildField::Brand, BuildField::Model]),
        );
        let decision = h.resolver.apply("com.google.android.deskclock");

        // The decision still counts every attempted field; only the store
        // record is missing the rejected writes.
        assert_eq!(decision.fields_overridden.len(), 6);
        assert_eq!(
            h.store.commands(),
            vec![
                field(BuildField::Manufacturer, "Google"),
                field(BuildField::Device, "cheetah"),
                field(BuildField::Product, "cheetah"),
                field(
                    BuildField::Fingerprint,
                    "google/cheetah/cheetah:13/TQ2A.230505.002/9891397:user/release-keys"
                ),
            ]
        );
    }

    #[test]
    fn unstable_gms_process_takes_the_legacy_fallback() {
        let h = harness(
            OverrideConfig::default(),
            FixedProcess(Some(PROCESS_GMS_UNSTABLE)),
            FixedBuild::default(),
        );
        let decision = h.resolver.apply(PACKAGE_GMS);

        assert!(h.session.is_unstable_gms());
        assert_eq!(decision.fingerprint, FingerprintSelection::LegacyFallback);
        assert_eq!(decision.sdk_level_rewritten, Some(SDK_INT_N_MR1));

        let commands = h.store.commands();
        let tail = &commands[commands.len() - 6..];
        assert_eq!(
            tail,
            &[
                field(BuildField::Fingerprint, LEGACY_FALLBACK_FINGERPRINT),
                field(BuildField::Product, "marlin"),
                field(BuildField::Device, "marlin"),
                field(BuildField::Model, "Pixel XL"),
                Command::SdkLevel(SDK_INT_N_MR1),
                field(BuildField::Type, "userdebug"),
            ]
        );
    }

    #[test]
    fn gms_stable_process_does_not_set_the_flag() {
        let h = harness(
            OverrideConfig::default(),
            FixedProcess(Some("com.google.android.gms.persistent")),
            FixedBuild::default(),
        );
        let decision = h.resolver.apply(PACKAGE_GMS);

        assert!(!h.session.is_unstable_gms());
        assert_eq!(decision.fingerprint, FingerprintSelection::Unchanged);
    }

    #[test]
    fn certified_fingerprint_beats_the_legacy_fallback() {
        let config = OverrideConfig {
            certified_fingerprint: "vendor/cert/device:13/ID/1:user/release-keys".to_string(),
            ..Default::default()
        };
        let h = harness(
            config,
            FixedProcess(Some(PROCESS_GMS_UNSTABLE)),
            FixedBuild {
                initial_sdk: 30,
                ..Default::default()
            },
        );
        let decision = h.resolver.apply(PACKAGE_GMS);

        assert_eq!(decision.fingerprint, FingerprintSelection::Certified);
        // No rewrite to the historical level, no legacy fields, and with the
        // initial level already at or below the threshold no clamp either.
        assert_eq!(decision.sdk_level_rewritten, None);
        let commands = h.store.commands();
        assert_eq!(
            commands.last(),
            Some(&field(
                BuildField::Fingerprint,
                "vendor/cert/device:13/ID/1:user/release-keys"
            ))
        );
        assert!(!commands.iter().any(|c| matches!(c, Command::SdkLevel(_))));
        assert!(!commands.contains(&field(BuildField::Model, "Pixel XL")));
    }

    #[test]
    fn certified_fingerprint_applies_to_later_targets_once_store_client_seen() {
        let config = OverrideConfig {
            certified_fingerprint: "vendor/cert/device:13/ID/1:user/release-keys".to_string(),
            ..Default::default()
        };
        let h = harness(config, FixedProcess(None), FixedBuild::default());

        h.resolver.apply(PACKAGE_STORE_CLIENT);
        let decision = h.resolver.apply("com.google.android.deskclock");

        assert_eq!(decision.fingerprint, FingerprintSelection::Certified);
    }

    #[test]
    fn stock_fingerprint_applies_only_to_the_ar_core_package() {
        let config = OverrideConfig {
            stock_fingerprint: "vendor/stock/device:13/ID/1:user/release-keys".to_string(),
            ..Default::default()
        };
        // AR core itself sits on the keep-list, so the stock branch can only
        // be observed through a non-exempt probe; assert the exempt path and
        // that no other target picks the stock value up.
        let h = harness(config, FixedProcess(None), FixedBuild::default());

        let decision = h.resolver.apply(PACKAGE_AR_CORE);
        assert_eq!(decision.classification, PackageClass::Exempt);
        assert!(h.store.commands().is_empty());

        let decision = h.resolver.apply("com.google.android.deskclock");
        assert_eq!(decision.fingerprint, FingerprintSelection::Unchanged);
    }

    #[test]
    fn sdk_level_is_clamped_when_certified_branch_skips_the_fallback() {
        let config = OverrideConfig {
            certified_fingerprint: "vendor/cert/device:13/ID/1:user/release-keys".to_string(),
            ..Default::default()
        };
        let h = harness(
            config,
            FixedProcess(Some(PROCESS_GMS_UNSTABLE)),
            FixedBuild {
                initial_sdk: 34,
                ..Default::default()
            },
        );
        let decision = h.resolver.apply(PACKAGE_GMS);

        // Certified fingerprint won, so the legacy fallback did not run;
        // the initial level still gets clamped down to the threshold.
        assert_eq!(decision.fingerprint, FingerprintSelection::Certified);
        assert_eq!(decision.sdk_level_rewritten, Some(SDK_INT_S));
        assert!(h.store.commands().contains(&Command::SdkLevel(SDK_INT_S)));
    }

    #[test]
    fn photo_client_skip_still_runs_fingerprint_logic() {
        let config = OverrideConfig {
            certified_fingerprint: "vendor/cert/device:13/ID/1:user/release-keys".to_string(),
            ..Default::default()
        };
        let h = harness(
            config,
            FixedProcess(None),
            FixedBuild {
                codename: "raven",
                ..Default::default()
            },
        );
        h.session.note_store_client();

        let decision = h.resolver.apply(PACKAGE_PHOTOS);

        // Profile skipped on reference hardware without the toggle...
        assert_eq!(decision.profile, None);
        assert!(decision.fields_overridden.is_empty());
        // ...but the fingerprint chain still applies.
        assert_eq!(decision.fingerprint, FingerprintSelection::Certified);
    }

    #[test]
    fn photo_client_toggle_selects_the_legacy_profile() {
        let config = OverrideConfig {
            legacy_photo_profile: true,
            ..Default::default()
        };
        let h = harness(config, FixedProcess(None), FixedBuild::default());
        let decision = h.resolver.apply(PACKAGE_PHOTOS);

        assert_eq!(decision.profile.as_deref(), Some("Pixel XL"));
        assert_eq!(
            h.store.commands()[5],
            field(
                BuildField::Fingerprint,
                "google/marlin/marlin:10/QP1A.191005.007.A3/5972272:user/release-keys"
            )
        );
    }

    #[test]
    fn suppressed_fingerprint_still_overridden_by_fingerprint_rules() {
        let h = harness(
            OverrideConfig::default(),
            FixedProcess(None),
            FixedBuild::default(),
        );
        let decision = h.resolver.apply(PACKAGE_SETTINGS_INTELLIGENCE);

        // FINGERPRINT is suppressed during the field loop...
        assert_eq!(decision.fields_suppressed, vec![BuildField::Fingerprint]);
        assert!(!decision.fields_overridden.contains(&BuildField::Fingerprint));
        // ...yet the indexing rule writes it unconditionally afterwards.
        assert!(decision.real_build_fingerprint);
        assert_eq!(
            h.store.commands().last(),
            Some(&field(BuildField::Fingerprint, "9163457"))
        );
    }

    #[test]
    fn indexing_service_keeps_real_fingerprint_even_when_profile_skipped() {
        let h = harness(
            OverrideConfig::default(),
            FixedProcess(None),
            FixedBuild {
                codename: "panther",
                incremental: "5124711",
                ..Default::default()
            },
        );
        let decision = h.resolver.apply(PACKAGE_SETTINGS_INTELLIGENCE);

        assert!(decision.fields_overridden.is_empty());
        assert!(decision.real_build_fingerprint);
        assert_eq!(
            h.store.commands(),
            vec![field(BuildField::Fingerprint, "5124711")]
        );
    }
}
