//! macOS installer packages.
//!
//! Both bundlers wrap an `.app` image into a flat package with the Xcode
//! command line tools:
//!
//! | Bundler | Tools | Notes |
//! |---------|-------|-------|
//! | [`MacPkgBundler`] | `codesign`, `pkgbuild`, `productbuild` | Developer ID signing optional |
//! | [`MacAppStoreBundler`] | `codesign`, `productbuild` | App Store keys required |
//!
//! # Signing keys
//!
//! Keys are certificate common names. Unless given explicitly they are looked
//! up in the keychain from `mac-signing-key-user-name`:
//!
//! ```text
//! Developer ID Application: <user>
//! Developer ID Installer: <user>
//! 3rd Party Mac Developer Application: <user>
//! 3rd Party Mac Developer Installer: <user>
//! ```

mod app_store;
mod pkg;
pub mod sign;

pub use app_store::MacAppStoreBundler;
pub use pkg::MacPkgBundler;

use crate::bundler::{
    error::Result,
    params::{Param, ParamId, ParamStore, standard},
};
use std::{path::PathBuf, process::Command};

/// Enable code signing.
pub const SIGN: Param<bool> = Param::new(ParamId::MacSign)
    .with_default(|_| Ok(Some(false)))
    .with_convert(standard::hint);

/// Certificate user name.
pub const SIGNING_KEY_USER: Param<String> =
    Param::new(ParamId::MacSigningKeyUser).with_convert(standard::string);

/// Keychain holding the signing certificates.
pub const SIGNING_KEYCHAIN: Param<PathBuf> =
    Param::new(ParamId::MacSigningKeychain).with_convert(standard::path);

/// Prefix for the identifiers of signed inner components.
pub const BUNDLE_SIGNING_PREFIX: Param<String> = Param::new(ParamId::MacBundleSigningPrefix)
    .with_default(|store| Ok(store.fetch(&standard::IDENTIFIER)?.map(|id| format!("{id}."))))
    .with_convert(standard::string);

/// Bundle name shown in the menu bar.
pub const BUNDLE_NAME: Param<String> =
    Param::new(ParamId::MacBundleName).with_convert(standard::string);

/// Developer ID application key.
pub const DEVELOPER_ID_APP_KEY: Param<String> = Param::new(ParamId::MacDeveloperIdAppKey)
    .with_default(|store| find_key(store, "Developer ID Application: "))
    .with_convert(standard::string);

/// Developer ID installer key.
pub const DEVELOPER_ID_INSTALLER_KEY: Param<String> =
    Param::new(ParamId::MacDeveloperIdInstallerKey)
        .with_default(|store| find_key(store, "Developer ID Installer: "))
        .with_convert(standard::string);

/// App Store application key.
pub const APP_STORE_APP_KEY: Param<String> = Param::new(ParamId::MacAppStoreAppKey)
    .with_default(|store| find_key(store, "3rd Party Mac Developer Application: "))
    .with_convert(standard::string);

/// App Store installer key.
pub const APP_STORE_PKG_KEY: Param<String> = Param::new(ParamId::MacAppStorePkgKey)
    .with_default(|store| find_key(store, "3rd Party Mac Developer Installer: "))
    .with_convert(standard::string);

/// Entitlements override for App Store builds.
pub const APP_STORE_ENTITLEMENTS: Param<PathBuf> =
    Param::new(ParamId::MacAppStoreEntitlements).with_convert(standard::path);

/// Installer name suffix for App Store builds.
pub const APP_STORE_SUFFIX: Param<String> = Param::new(ParamId::MacAppStoreSuffix)
    .with_default(|_| Ok(Some("-MacAppStore".to_string())))
    .with_convert(standard::string);

/// Whether signing was requested.
pub fn signing_enabled(store: &mut ParamStore) -> Result<bool> {
    store.fetch_or(&SIGN, false)
}

/// Looks `<prefix><user>` up with `security find-certificate`.
///
/// Absent when no user name is configured or the certificate is missing.
fn find_key(store: &mut ParamStore, prefix: &str) -> Result<Option<String>> {
    let Some(user) = store.fetch(&SIGNING_KEY_USER)? else {
        return Ok(None);
    };
    let name = format!("{prefix}{user}");
    let keychain = store.fetch(&SIGNING_KEYCHAIN)?;

    let mut cmd = Command::new("security");
    cmd.arg("find-certificate").arg("-c").arg(&name);
    if let Some(keychain) = &keychain {
        cmd.arg(keychain);
    }

    match cmd.output() {
        Ok(output) if output.status.success() => {
            let stdout = String::from_utf8_lossy(&output.stdout);
            if stdout.contains(&name) {
                log::debug!("Found signing key {}", name);
                Ok(Some(name))
            } else {
                log::debug!("Signing key {} not listed by security", name);
                Ok(None)
            }
        }
        Ok(output) => {
            log::debug!(
                "security find-certificate for {} exited with {}",
                name,
                output.status
            );
            Ok(None)
        }
        Err(e) => {
            log::debug!("Could not run security to look up {}: {}", name, e);
            Ok(None)
        }
    }
}
