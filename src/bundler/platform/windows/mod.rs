//! Windows installers.
//!
//! # Supported Formats
//!
//! | Format | Bundler | Required Tools |
//! |--------|---------|----------------|
//! | .exe | [`WinExeBundler`] | Inno Setup 5 or newer (`iscc`) |
//! | .msi | [`WinMsiBundler`] | WiX 3.0 or newer (`candle`, `light`) |
//!
//! Tools are looked up on `PATH` unless given with `--win-iscc`,
//! `--win-wix-candle` and `--win-wix-light`.
//!
//! # Shortcuts
//!
//! An installer that creates neither a start menu entry nor a desktop
//! shortcut leaves nothing to launch the application with, so a start menu
//! entry is forced when both hints are off.

mod exe;
mod msi;
pub mod rtf;

pub use exe::WinExeBundler;
pub use msi::WinMsiBundler;

use crate::bundler::{
    error::{Error, Result},
    params::{Param, ParamId, ParamStore, standard},
    platform::{BuildContext, checks},
    utils::process::ToolCommand,
};
use regex::Regex;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Start menu entry.
pub const MENU_HINT: Param<bool> = Param::new(ParamId::WinMenuHint)
    .with_default(|_| Ok(Some(false)))
    .with_convert(standard::hint);

/// Desktop shortcut. A bare flag does not enable it.
pub const SHORTCUT_HINT: Param<bool> = Param::new(ParamId::WinShortcutHint)
    .with_default(|_| Ok(Some(false)))
    .with_convert(|raw, _| {
        let raw = raw.trim();
        Ok(!(raw.is_empty() || raw == "null") && raw.eq_ignore_ascii_case("true"))
    });

/// Start menu group.
pub const MENU_GROUP: Param<String> = Param::new(ParamId::WinMenuGroup)
    .with_default(|_| Ok(Some("Unknown".to_string())))
    .with_convert(standard::string);

/// Install into the user profile instead of Program Files.
pub const PER_USER_INSTALL: Param<bool> = Param::new(ParamId::WinPerUserInstall)
    .with_default(|_| Ok(Some(false)))
    .with_convert(standard::hint);

/// Show the install directory page.
pub const DIR_CHOOSER: Param<bool> = Param::new(ParamId::WinDirChooser)
    .with_default(|_| Ok(Some(false)))
    .with_convert(standard::hint);

/// Upgrade code shared by every version of the product.
pub const UPGRADE_UUID: Param<Uuid> = Param::new(ParamId::WinUpgradeUuid)
    .with_default(|_| Ok(Some(Uuid::new_v4())))
    .with_convert(|raw, _| Ok(Uuid::parse_str(raw.trim())?));

/// Numeric product version, defaulting to the application version.
pub const PRODUCT_VERSION: Param<String> = Param::new(ParamId::WinProductVersion)
    .with_default(|store| store.fetch(&standard::VERSION))
    .with_convert(standard::string);

/// Inno Setup compiler.
pub const INNO_SETUP_COMPILER: Param<PathBuf> = Param::new(ParamId::WinInnoSetupCompiler)
    .with_default(|_| Ok(locate("iscc")))
    .with_convert(standard::path);

/// WiX compiler.
pub const WIX_CANDLE: Param<PathBuf> = Param::new(ParamId::WinWixCandle)
    .with_default(|_| Ok(locate("candle")))
    .with_convert(standard::path);

/// WiX linker.
pub const WIX_LIGHT: Param<PathBuf> = Param::new(ParamId::WinWixLight)
    .with_default(|_| Ok(locate("light")))
    .with_convert(standard::path);

fn locate(tool: &str) -> Option<PathBuf> {
    match which::which(tool) {
        Ok(path) => {
            log::debug!("Found {} at {}", tool, path.display());
            Some(path)
        }
        Err(e) => {
            log::debug!("{} not found on PATH: {}", tool, e);
            None
        }
    }
}

/// Installer preconditions plus the Windows-only single line fields.
pub fn windows_preconditions(store: &mut ParamStore) -> Result<()> {
    checks::installer_preconditions(store)?;
    checks::single_line(store, &[MENU_GROUP])
}

/// Forces a start menu entry when neither shortcut kind was requested.
pub fn force_menu_hint(store: &mut ParamStore) -> Result<()> {
    let menu = store.fetch_or(&MENU_HINT, false)?;
    let shortcut = store.fetch_or(&SHORTCUT_HINT, false)?;
    if !menu && !shortcut {
        log::info!("Neither a menu entry nor a shortcut was requested, adding a start menu entry");
        store.put(ParamId::WinMenuHint, true);
    }
    Ok(())
}

/// Resolves a tool parameter or fails with a configuration error.
fn require_tool(store: &mut ParamStore, param: &Param<PathBuf>, label: &str) -> Result<PathBuf> {
    store.fetch(param)?.ok_or_else(|| {
        Error::config(
            format!("{label} could not be found"),
            format!("Install {label} and add it to PATH, or pass --{}", param.id()),
        )
    })
}

/// Runs a version probe and returns the `major.minor` it reports.
async fn probe_version(
    ctx: &BuildContext,
    tool: &Path,
    flag: &str,
    pattern: &str,
    label: &str,
) -> Result<(u32, u32)> {
    let output = ctx
        .exec(ToolCommand::new(tool).arg(flag).probe())
        .await
        .map_err(|e| {
            Error::config(
                format!("{label} could not be run: {e}"),
                format!("Check that {} is a working {label} installation", tool.display()),
            )
        })?;

    let re = Regex::new(pattern)?;
    parse_version(&re, &output.output).ok_or_else(|| {
        Error::config(
            format!("could not determine the {label} version"),
            format!("Check that {} is a working {label} installation", tool.display()),
        )
    })
}

/// First `major[.minor]` captured by `re`.
fn parse_version(re: &Regex, text: &str) -> Option<(u32, u32)> {
    let caps = re.captures(text)?;
    let major = caps.get(1)?.as_str().parse().ok()?;
    let minor = caps
        .get(2)
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0);
    Some((major, minor))
}

/// Ensures a probed version is at least `minimum`.
fn require_version(found: (u32, u32), minimum: (u32, u32), label: &str) -> Result<()> {
    if found < minimum {
        return Err(Error::config(
            format!(
                "{label} {}.{} is too old, {}.{} or newer is required",
                found.0, found.1, minimum.0, minimum.1
            ),
            format!("Install {label} {}.{} or newer", minimum.0, minimum.1),
        ));
    }
    log::debug!("{} version {}.{}", label, found.0, found.1);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shortcut_bare_flag_stays_off() {
        let mut store = ParamStore::new();
        store.put_raw(ParamId::WinShortcutHint, "");
        assert!(!store.require(&SHORTCUT_HINT).unwrap());

        let mut store = ParamStore::new();
        store.put_raw(ParamId::WinMenuHint, "");
        assert!(store.require(&MENU_HINT).unwrap());
    }

    #[test]
    fn test_menu_forced_when_no_shortcuts() {
        let mut store = ParamStore::new();
        force_menu_hint(&mut store).unwrap();
        assert_eq!(store.peek(&MENU_HINT), Some(true));

        let mut store = ParamStore::new();
        store.put(ParamId::WinShortcutHint, true);
        force_menu_hint(&mut store).unwrap();
        assert_eq!(store.peek(&MENU_HINT), Some(false));
    }

    #[test]
    fn test_inno_version_parsing() {
        let re = Regex::new(exe::INNO_VERSION_PATTERN).unwrap();
        let banner = "Inno Setup 6.2.2 Command-Line Compiler\nCopyright (C) 1997-2023";
        assert_eq!(parse_version(&re, banner), Some((6, 2)));
        assert!(require_version((6, 2), (5, 0), "Inno Setup").is_ok());
        assert!(require_version((4, 9), (5, 0), "Inno Setup").is_err());
    }

    #[test]
    fn test_upgrade_uuid_parsed() {
        let mut store = ParamStore::new();
        store.put_raw(ParamId::WinUpgradeUuid, "6d1f3c2e-5a4b-4c3d-9e8f-0a1b2c3d4e5f");
        let uuid = store.require(&UPGRADE_UUID).unwrap();
        assert_eq!(uuid.to_string(), "6d1f3c2e-5a4b-4c3d-9e8f-0a1b2c3d4e5f");
    }
}
