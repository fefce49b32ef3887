//! Static profile and classification tables.
//!
//! All tables are constructed once and read-only thereafter. The data here is
//! policy, not configuration: the package sets, reference-device codenames and
//! profile field values are fixed properties of the identities being
//! presented.

use crate::config::OverrideConfig;
use guise_types::{BuildField, IdentityProfile, PackageClass};
use std::collections::{HashMap, HashSet};

pub const PACKAGE_AR_CORE: &str = "com.google.ar.core";
pub const PACKAGE_RESTORE: &str = "com.google.android.apps.restore";
pub const PACKAGE_PHOTOS: &str = "com.google.android.apps.photos";
pub const PACKAGE_GMS: &str = "com.google.android.gms";
pub const PROCESS_GMS_UNSTABLE: &str = "com.google.android.gms.unstable";
pub const PACKAGE_STORE_CLIENT: &str = "com.android.vending";
pub const PACKAGE_SETTINGS_INTELLIGENCE: &str = "com.google.android.settings.intelligence";

/// Vendor-domain prefix; any package under it is targeted.
pub const VENDOR_PREFIX: &str = "com.google.";

/// Fingerprint presented by the legacy fallback branch.
pub const LEGACY_FALLBACK_FINGERPRINT: &str =
    "google/marlin/marlin:7.1.2/NJH47F/4146041:user/release-keys";

/// Historical initial SDK level presented alongside the legacy fallback.
pub const SDK_INT_N_MR1: i32 = 25;

/// Newest initial SDK level the emulated identity may report.
pub const SDK_INT_S: i32 = 31;

/// Packages that are never touched, camera and companion apps above all.
const EXEMPT_PACKAGES: &[&str] = &[
    "com.google.android.GoogleCamera.Cameight",
    "com.google.android.GoogleCamera.Go",
    "com.google.android.GoogleCamera.Urnyx",
    "com.google.android.GoogleCameraAsp",
    "com.google.android.GoogleCameraCVM",
    "com.google.android.GoogleCameraEng",
    "com.google.android.GoogleCameraEng2",
    "com.google.android.GoogleCameraGood",
    "com.google.android.MTCL83",
    "com.google.android.UltraCVM",
    "com.google.android.apps.cameralite",
    "com.google.android.apps.recorder",
    "com.google.android.apps.wearables.maestro.companion",
    "com.google.android.apps.youtube.kids",
    "com.google.android.apps.youtube.music",
    "com.google.android.dialer",
    "com.google.android.euicc",
    "com.google.android.youtube",
    PACKAGE_AR_CORE,
    PACKAGE_RESTORE,
];

/// Explicitly targeted packages outside the vendor-domain prefix rule
/// (plus a few inside it, harmlessly redundant).
const TARGET_PACKAGES: &[&str] = &[
    "com.google.android.apps.googleassistant",
    "com.google.android.apps.nbu.files",
    "com.google.android.apps.podcasts",
    "com.google.android.apps.privacy.wildlife",
    "com.google.android.apps.subscriptions.red",
    "com.google.android.apps.tachyon",
    "com.google.android.apps.wallpaper",
    "com.google.android.contacts",
    "com.google.android.deskclock",
    "com.google.android.inputmethod.latin",
    "com.google.android.apps.turbo",
    "com.google.android.googlequicksearchbox",
    "com.android.chrome",
    "com.breel.wallpapers20",
    PACKAGE_STORE_CLIENT,
];

/// Codenames of currently supported reference devices.
const REFERENCE_CODENAMES: &[&str] = &[
    "cheetah", "panther", "bluejay", "oriole", "raven", "redfin", "barbet", "bramble", "sunfish",
    "coral", "flame",
];

/// Immutable lookup tables: named profiles, classification sets, per-package
/// field suppression, reference-device codenames.
#[derive(Debug)]
pub struct ProfileTable {
    exempt: HashSet<&'static str>,
    targets: HashSet<&'static str>,
    reference_codenames: HashSet<&'static str>,
    suppressed: HashMap<&'static str, Vec<BuildField>>,
    current_profile: IdentityProfile,
    legacy_profile: IdentityProfile,
}

impl ProfileTable {
    pub fn new() -> Self {
        let mut suppressed = HashMap::new();
        // The settings indexing service derives its fingerprint from the real
        // build incremental; its FINGERPRINT must survive the field loop.
        suppressed.insert(PACKAGE_SETTINGS_INTELLIGENCE, vec![BuildField::Fingerprint]);

        Self {
            exempt: EXEMPT_PACKAGES.iter().copied().collect(),
            targets: TARGET_PACKAGES.iter().copied().collect(),
            reference_codenames: REFERENCE_CODENAMES.iter().copied().collect(),
            suppressed,
            current_profile: current_reference_profile(),
            legacy_profile: legacy_reference_profile(),
        }
    }

    /// Classify a package name. Deterministic and total; empty input is
    /// exempt (no-op).
    pub fn classify(&self, package: &str) -> PackageClass {
        if package.is_empty() || self.exempt.contains(package) {
            return PackageClass::Exempt;
        }
        if package == PACKAGE_STORE_CLIENT {
            return PackageClass::StoreClient;
        }
        if package.starts_with(VENDOR_PREFIX) || self.targets.contains(package) {
            return PackageClass::Targeted;
        }
        PackageClass::Untargeted
    }

    /// Candidate profile for a targeted package.
    ///
    /// The photo-backup client selects the legacy profile when the runtime
    /// toggle is enabled; otherwise it skips entirely on reference hardware.
    /// Every other targeted package gets the current reference profile
    /// regardless of what hardware it runs on.
    pub fn profile_for(
        &self,
        package: &str,
        on_reference_device: bool,
        config: &OverrideConfig,
    ) -> Option<&IdentityProfile> {
        if package == PACKAGE_PHOTOS {
            if config.legacy_photo_profile {
                return Some(&self.legacy_profile);
            }
            if on_reference_device {
                return None;
            }
        }
        Some(&self.current_profile)
    }

    /// Fields that must not be overridden for this package during the
    /// per-field loop.
    pub fn suppressed_fields(&self, package: &str) -> &[BuildField] {
        self.suppressed
            .get(package)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Whether the running hardware already is a reference device.
    pub fn is_reference_device(&self, codename: &str) -> bool {
        self.reference_codenames.contains(codename)
    }

    pub fn current_profile(&self) -> &IdentityProfile {
        &self.current_profile
    }

    pub fn legacy_profile(&self) -> &IdentityProfile {
        &self.legacy_profile
    }
}

impl Default for ProfileTable {
    fn default() -> Self {
        Self::new()
    }
}

fn current_reference_profile() -> IdentityProfile {
    IdentityProfile::new("Pixel 7 Pro")
        .with_field(BuildField::Brand, "google")
        .with_field(BuildField::Manufacturer, "Google")
        .with_field(BuildField::Device, "cheetah")
        .with_field(BuildField::Product, "cheetah")
        .with_field(BuildField::Model, "Pixel 7 Pro")
        .with_field(
            BuildField::Fingerprint,
            "google/cheetah/cheetah:13/TQ2A.230505.002/9891397:user/release-keys",
        )
}

fn legacy_reference_profile() -> IdentityProfile {
    IdentityProfile::new("Pixel XL")
        .with_field(BuildField::Brand, "google")
        .with_field(BuildField::Manufacturer, "Google")
        .with_field(BuildField::Device, "marlin")
        .with_field(BuildField::Product, "marlin")
        .with_field(BuildField::Model, "Pixel XL")
        .with_field(
            BuildField::Fingerprint,
            "google/marlin/marlin:10/QP1A.191005.007.A3/5972272:user/release-keys",
        )
}
