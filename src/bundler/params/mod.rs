//! Lazily resolved, memoizing configuration parameters.
//!
//! A packaging run is configured through a single [`ParamStore`]. Callers seed
//! it with raw strings (from the CLI or a parameter file) or typed values, and
//! bundlers read it through typed [`Param`] descriptors:
//!
//! ```no_run
//! use kodegen_bundler_package::bundler::params::{standard, ParamId, ParamStore};
//!
//! # fn example() -> kodegen_bundler_package::bundler::Result<()> {
//! let mut store = ParamStore::new();
//! store.put_raw(ParamId::MainClass, "com.example.Hello");
//!
//! // Neither is set; both are derived from the main class and then cached.
//! let name = store.fetch(&standard::APP_NAME)?;
//! let identifier = store.fetch(&standard::IDENTIFIER)?;
//! assert_eq!(name.as_deref(), Some("Hello"));
//! assert_eq!(identifier.as_deref(), Some("com.example"));
//! # Ok(())
//! # }
//! ```
//!
//! Fetch semantics:
//!
//! 1. a typed entry of the descriptor's type is returned as is;
//! 2. a raw string entry is converted, cached and returned;
//! 3. a missing entry is computed by the descriptor's default, cached and
//!    returned; without a default the result is `None`.
//!
//! Explicit writes replace only their own key.

mod convert;
mod fileset;
pub mod manifest;
pub mod standard;
mod store;

pub use convert::{parse_properties, split_with_escapes};
pub use fileset::RelativeFileSet;
pub use manifest::LaunchInfo;
pub use store::ParamStore;

use crate::bundler::error::{Error, Result};
use std::{collections::BTreeMap, fmt, path::PathBuf, str::FromStr};
use uuid::Uuid;

macro_rules! param_ids {
    ($($(#[$meta:meta])* $variant:ident => $key:literal,)+) => {
        /// Identifier of a configuration parameter.
        #[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
        #[non_exhaustive]
        pub enum ParamId {
            $($(#[$meta])* $variant,)+
        }

        impl ParamId {
            /// Every known id, in declaration order.
            pub const ALL: &'static [ParamId] = &[$(ParamId::$variant,)+];

            /// Stable kebab-case key used on the command line and in parameter files.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(ParamId::$variant => $key,)+
                }
            }
        }
    };
}

param_ids! {
    /// Input directory holding the application files.
    Input => "input",
    /// Application files as one file set.
    AppResources => "app-resources",
    /// Application files as a list of file sets.
    AppResourcesList => "app-resources-list",
    /// Jar holding the entry point.
    MainJar => "main-jar",
    /// Class path relative to the application directory.
    Classpath => "classpath",
    /// Fully qualified entry point class.
    MainClass => "main-class",
    /// Application name.
    AppName => "app-name",
    /// Application name stripped of characters illegal in file names.
    AppFsName => "app-fs-name",
    /// Application icon.
    Icon => "icon",
    /// Custom launcher executable or script.
    Launcher => "launcher",
    /// Vendor name.
    Vendor => "vendor",
    /// Application category.
    Category => "category",
    /// Long description.
    Description => "description",
    /// Copyright notice.
    Copyright => "copyright",
    /// Default application arguments.
    Arguments => "arguments",
    /// JVM options.
    JavaOptions => "java-options",
    /// JVM system properties.
    JvmProperties => "jvm-properties",
    /// Window / installer title.
    Title => "title",
    /// Application version.
    Version => "version",
    /// License files, relative to the application resources.
    LicenseFile => "license-file",
    /// Scratch directory for intermediate files.
    BuildRoot => "build-root",
    /// Directory for platform configuration files.
    ConfigRoot => "config-root",
    /// Directory for intermediate images.
    ImagesRoot => "images-root",
    /// Working image directory owned by the current build.
    WorkingImageDir => "working-image-dir",
    /// Reverse-DNS application identifier.
    Identifier => "identifier",
    /// Preferences node path.
    PreferencesId => "preferences-id",
    /// Keep intermediates and log more.
    Verbose => "verbose",
    /// Directory searched first for overridable resources.
    DropInResourcesRoot => "resource-dir",
    /// Installation directory.
    InstallDir => "install-dir",
    /// Installer file base name.
    InstallerName => "installer-name",
    /// Existing application image to package instead of building one.
    PredefinedAppImage => "predefined-app-image",
    /// Existing runtime image to embed.
    PredefinedRuntimeImage => "runtime-image",
    /// Additional launchers.
    SecondaryLaunchers => "secondary-launcher",
    /// File associations.
    FileAssociations => "file-associations",
    /// Extensions of one file association.
    FaExtensions => "extension",
    /// Content type of one file association.
    FaContentType => "mime-type",
    /// Description of one file association.
    FaDescription => "fa-description",
    /// Icon of one file association.
    FaIcon => "fa-icon",
    /// Allow only a single running instance.
    Singleton => "singleton",
    /// Add a start menu entry.
    WinMenuHint => "win-menu",
    /// Add a desktop shortcut.
    WinShortcutHint => "win-shortcut",
    /// Start menu group.
    WinMenuGroup => "win-menu-group",
    /// Install for the current user only.
    WinPerUserInstall => "win-per-user-install",
    /// Let the user choose the install directory.
    WinDirChooser => "win-dir-chooser",
    /// Stable upgrade code.
    WinUpgradeUuid => "win-upgrade-uuid",
    /// Numeric product version.
    WinProductVersion => "win-product-version",
    /// Inno Setup compiler.
    WinInnoSetupCompiler => "win-iscc",
    /// WiX compiler.
    WinWixCandle => "win-wix-candle",
    /// WiX linker.
    WinWixLight => "win-wix-light",
    /// Enable signing.
    MacSign => "mac-sign",
    /// Certificate user name used to look up signing keys.
    MacSigningKeyUser => "mac-signing-key-user-name",
    /// Keychain holding the signing keys.
    MacSigningKeychain => "mac-signing-keychain",
    /// Prefix for inner component signing identifiers.
    MacBundleSigningPrefix => "mac-bundle-signing-prefix",
    /// Bundle name shown by the Finder.
    MacBundleName => "mac-bundle-name",
    /// Developer ID application signing key.
    MacDeveloperIdAppKey => "mac-signing-key-developer-id-app",
    /// Developer ID installer signing key.
    MacDeveloperIdInstallerKey => "mac-signing-key-developer-id-installer",
    /// App Store application signing key.
    MacAppStoreAppKey => "mac-signing-key-app",
    /// App Store installer signing key.
    MacAppStorePkgKey => "mac-signing-key-pkg",
    /// Entitlements override for App Store builds.
    MacAppStoreEntitlements => "mac-app-store-entitlements",
    /// Installer name suffix for App Store builds.
    MacAppStoreSuffix => "mac-app-store-installer-suffix",
    /// Package name.
    LinuxPackageName => "linux-package-name",
    /// Additional package dependencies.
    LinuxPackageDeps => "linux-package-deps",
    /// Maintainer e-mail.
    LinuxMaintainerEmail => "linux-deb-maintainer",
    /// RPM license type.
    LinuxRpmLicenseType => "linux-rpm-license-type",
    /// Menu group for desktop entries.
    LinuxMenuGroup => "linux-menu-group",
}

impl fmt::Display for ParamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ParamId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        ParamId::ALL
            .iter()
            .copied()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| {
                Error::config(
                    format!("unknown parameter '{s}'"),
                    "Run with --help to list the supported parameters",
                )
            })
    }
}

/// A stored parameter value.
///
/// `Raw` holds external string input awaiting conversion; `Unset` marks an
/// entry that was explicitly cleared and must not be recomputed.
#[derive(Clone, Debug, PartialEq)]
pub enum ParamValue {
    /// Unconverted external input.
    Raw(String),
    /// Explicitly cleared.
    Unset,
    /// Resolved string.
    Str(String),
    /// Resolved path.
    Path(PathBuf),
    /// Resolved flag.
    Bool(bool),
    /// Resolved list of strings.
    List(Vec<String>),
    /// Resolved string mapping.
    Map(BTreeMap<String, String>),
    /// Resolved file set.
    FileSet(RelativeFileSet),
    /// Resolved list of file sets.
    FileSets(Vec<RelativeFileSet>),
    /// Resolved UUID.
    Uuid(Uuid),
    /// Nested parameter stores (launchers, associations).
    Stores(Vec<ParamStore>),
}

/// Rust types a [`Param`] can resolve to.
pub trait ParamType: Clone + Sized {
    /// Extract a value of this type, if the stored variant matches.
    fn from_value(value: &ParamValue) -> Option<Self>;

    /// Wrap into the matching stored variant.
    fn into_value(self) -> ParamValue;
}

macro_rules! param_type {
    ($ty:ty, $variant:ident) => {
        impl ParamType for $ty {
            fn from_value(value: &ParamValue) -> Option<Self> {
                match value {
                    ParamValue::$variant(v) => Some(v.clone()),
                    _ => None,
                }
            }

            fn into_value(self) -> ParamValue {
                ParamValue::$variant(self)
            }
        }

        impl From<$ty> for ParamValue {
            fn from(value: $ty) -> Self {
                ParamValue::$variant(value)
            }
        }
    };
}

param_type!(String, Str);
param_type!(PathBuf, Path);
param_type!(bool, Bool);
param_type!(Vec<String>, List);
param_type!(BTreeMap<String, String>, Map);
param_type!(RelativeFileSet, FileSet);
param_type!(Vec<RelativeFileSet>, FileSets);
param_type!(Uuid, Uuid);
param_type!(Vec<ParamStore>, Stores);

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Str(value.to_string())
    }
}

/// Computes a default from other parameters.
pub type DefaultFn<T> = fn(&mut ParamStore) -> Result<Option<T>>;

/// Converts a raw string into the parameter's type.
pub type ConvertFn<T> = fn(&str, &mut ParamStore) -> Result<T>;

/// Descriptor of one typed parameter.
pub struct Param<T> {
    id: ParamId,
    default: Option<DefaultFn<T>>,
    convert: Option<ConvertFn<T>>,
}

impl<T> Clone for Param<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Param<T> {}

impl<T> fmt::Debug for Param<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Param")
            .field("id", &self.id)
            .field("has_default", &self.default.is_some())
            .field("has_convert", &self.convert.is_some())
            .finish()
    }
}

impl<T> Param<T> {
    /// Descriptor with neither default nor string conversion.
    pub const fn new(id: ParamId) -> Self {
        Param {
            id,
            default: None,
            convert: None,
        }
    }

    /// Attach a default computation.
    pub const fn with_default(self, default: DefaultFn<T>) -> Self {
        Param {
            id: self.id,
            default: Some(default),
            convert: self.convert,
        }
    }

    /// Attach a string conversion.
    pub const fn with_convert(self, convert: ConvertFn<T>) -> Self {
        Param {
            id: self.id,
            default: self.default,
            convert: Some(convert),
        }
    }

    /// Parameter id.
    pub const fn id(&self) -> ParamId {
        self.id
    }

    pub(crate) fn default_fn(&self) -> Option<DefaultFn<T>> {
        self.default
    }

    pub(crate) fn convert_fn(&self) -> Option<ConvertFn<T>> {
        self.convert
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_param_id_round_trips_through_key() {
        for id in ParamId::ALL {
            assert_eq!(id.as_str().parse::<ParamId>().unwrap(), *id);
        }
    }

    #[test]
    fn test_param_keys_are_unique() {
        let mut keys: Vec<_> = ParamId::ALL.iter().map(|id| id.as_str()).collect();
        keys.sort_unstable();
        keys.dedup();
        assert_eq!(keys.len(), ParamId::ALL.len());
    }

    #[test]
    fn test_unknown_key_is_configuration_error() {
        let err = "no-such-param".parse::<ParamId>().unwrap_err();
        assert_eq!(err.kind(), crate::bundler::error::ErrorKind::Configuration);
    }
}
