//! Linux system packages.
//!
//! | Format | Bundler | Required Tools |
//! |--------|---------|----------------|
//! | .deb | [`DebBundler`] | `dpkg-deb` |
//! | .rpm | [`RpmBundler`] | `rpmbuild` |
//!
//! Both install the application image under `/opt/<package>` and register a
//! desktop entry from the maintainer scripts when `xdg-desktop-menu` is
//! available on the target system.

mod debian;
mod rpm;

pub use debian::DebBundler;
pub use rpm::RpmBundler;

use crate::bundler::{
    error::{Error, Result},
    image::AppImage,
    params::{Param, ParamId, ParamStore, standard},
    platform::{BuildContext, checks},
    resources::{self, ResourceRequest, Substitutions},
    utils::process::ToolCommand,
};
use std::fmt::Write as _;

/// Package name, the lower-cased file system name unless given.
pub const PACKAGE_NAME: Param<String> = Param::new(ParamId::LinuxPackageName)
    .with_default(|store| Ok(store.fetch(&standard::APP_FS_NAME)?.map(|n| n.to_lowercase())))
    .with_convert(standard::string);

/// Extra dependencies, copied verbatim into the package metadata.
pub const PACKAGE_DEPS: Param<String> = Param::new(ParamId::LinuxPackageDeps)
    .with_default(|_| Ok(Some(String::new())))
    .with_convert(standard::string);

/// Maintainer e-mail address.
pub const MAINTAINER_EMAIL: Param<String> =
    Param::new(ParamId::LinuxMaintainerEmail).with_convert(standard::string);

/// RPM `License:` tag.
pub const RPM_LICENSE_TYPE: Param<String> = Param::new(ParamId::LinuxRpmLicenseType)
    .with_default(|_| Ok(Some("Unknown".to_string())))
    .with_convert(standard::string);

/// Desktop menu category, defaulting to the application category.
pub const MENU_GROUP: Param<String> = Param::new(ParamId::LinuxMenuGroup)
    .with_default(|store| store.fetch(&standard::CATEGORY))
    .with_convert(standard::string);

/// Installer preconditions plus the Linux-only single line fields.
pub fn linux_preconditions(store: &mut ParamStore) -> Result<()> {
    checks::installer_preconditions(store)?;
    checks::single_line(store, &[PACKAGE_NAME, MENU_GROUP])
}

/// `<vendor> <email>`, or the vendor alone without an address.
pub fn maintainer(store: &mut ParamStore) -> Result<String> {
    let vendor = store.require(&standard::VENDOR)?;
    Ok(match store.fetch(&MAINTAINER_EMAIL)? {
        Some(email) if !email.trim().is_empty() => format!("{vendor} <{}>", email.trim()),
        _ => vendor,
    })
}

/// Fails with a configuration error unless `program --version` runs.
async fn probe_tool(ctx: &BuildContext, program: &str, package: &str) -> Result<()> {
    let output = ctx
        .exec(ToolCommand::new(program).arg("--version").probe())
        .await
        .map_err(|e| {
            Error::config(
                format!("{program} could not be run: {e}"),
                format!("Install {package} and make sure {program} is on PATH"),
            )
        })?;
    log::debug!(
        "{} reports {}",
        program,
        output.output.lines().next().unwrap_or_default()
    );
    Ok(())
}

/// Maintainer script fragments installing and removing the desktop entry.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DesktopCommands {
    /// Run after installation.
    pub install: String,
    /// Run before removal.
    pub uninstall: String,
}

/// Writes `<pkg>-<name>.desktop` into the image `lib` directory and returns
/// the scripts registering it from `install_root`.
pub async fn desktop_integration(
    store: &mut ParamStore,
    image: &AppImage,
    package: &str,
    install_root: &str,
) -> Result<DesktopCommands> {
    let name = image.name.clone();
    let file_name = format!("{package}-{name}.desktop");
    let lib = format!("{install_root}/lib");

    let icon = ["png", "svg", "xpm"]
        .iter()
        .map(|ext| format!("{name}.{ext}"))
        .find(|icon| image.root.join("lib").join(icon).is_file())
        .map(|icon| format!("{lib}/{icon}"));

    let launcher = format!("{install_root}/{}", image.launcher_relative().display());
    let mut mimes = Vec::new();
    for mut association in store.fetch(&standard::FILE_ASSOCIATIONS)?.unwrap_or_default() {
        mimes.extend(association.fetch(&standard::FA_CONTENT_TYPE)?.unwrap_or_default());
    }

    let mut subs = Substitutions::new();
    subs.insert("APPLICATION_NAME", Some(name.clone()));
    subs.insert("APPLICATION_DESCRIPTION", store.fetch(&standard::DESCRIPTION)?);
    subs.insert("APPLICATION_LAUNCHER_FILE", Some(launcher));
    subs.insert("APPLICATION_ICON", Some(icon.unwrap_or_default()));
    subs.insert(
        "DEPLOY_BUNDLE_CATEGORY",
        Some(store.fetch(&MENU_GROUP)?.unwrap_or_else(|| "Utility".to_string())),
    );
    subs.insert("DESKTOP_MIMES", Some(desktop_mimes(&mimes)));

    let request = ResourceRequest::for_store("Menu shortcut descriptor", store)?
        .public_name(format!("{name}.desktop"))
        .default_name("template.desktop");
    resources::render_to(&request, &subs, &image.root.join("lib").join(&file_name)).await?;

    Ok(desktop_commands(&format!("{lib}/{file_name}"), !mimes.is_empty()))
}

fn desktop_mimes(mimes: &[String]) -> String {
    if mimes.is_empty() {
        return String::new();
    }
    format!("MimeType={};", mimes.join(";"))
}

fn desktop_commands(desktop_file: &str, has_mimes: bool) -> DesktopCommands {
    let mut install = String::new();
    let mut uninstall = String::new();
    let _ = writeln!(install, "if command -v xdg-desktop-menu >/dev/null 2>&1; then");
    let _ = writeln!(install, "    xdg-desktop-menu install --novendor {desktop_file}");
    let _ = writeln!(uninstall, "if command -v xdg-desktop-menu >/dev/null 2>&1; then");
    let _ = writeln!(uninstall, "    xdg-desktop-menu uninstall --novendor {desktop_file}");
    if has_mimes {
        let _ = writeln!(install, "    update-desktop-database >/dev/null 2>&1 || true");
    }
    install.push_str("fi");
    uninstall.push_str("fi");
    DesktopCommands { install, uninstall }
}

/// Debian architecture name for the host.
pub fn debian_arch() -> &'static str {
    match std::env::consts::ARCH {
        "x86_64" => "amd64",
        "x86" => "i386",
        "aarch64" => "arm64",
        "arm" => "armhf",
        "riscv64" => "riscv64",
        "powerpc64" => "ppc64el",
        "s390x" => "s390x",
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_package_name_defaults_to_lowercase() {
        let mut store = ParamStore::new();
        store.put(ParamId::AppName, "HelloWorld".to_string());
        assert_eq!(store.require(&PACKAGE_NAME).unwrap(), "helloworld");
    }

    #[test]
    fn test_maintainer() {
        let mut store = ParamStore::new();
        store.put(ParamId::Vendor, "Acme".to_string());
        assert_eq!(maintainer(&mut store).unwrap(), "Acme");
        store.put(ParamId::LinuxMaintainerEmail, "ops@acme.test".to_string());
        assert_eq!(maintainer(&mut store).unwrap(), "Acme <ops@acme.test>");
    }

    #[test]
    fn test_menu_group_follows_category() {
        let mut store = ParamStore::new();
        store.put(ParamId::Category, "Development".to_string());
        assert_eq!(store.require(&MENU_GROUP).unwrap(), "Development");
    }

    #[test]
    fn test_desktop_commands() {
        let cmds = desktop_commands("/opt/hello/lib/hello-Hello.desktop", true);
        assert!(cmds.install.contains("xdg-desktop-menu install --novendor /opt/hello/lib/hello-Hello.desktop"));
        assert!(cmds.install.contains("update-desktop-database"));
        assert!(cmds.uninstall.contains("xdg-desktop-menu uninstall"));
        assert!(cmds.uninstall.ends_with("fi"));
        assert_eq!(desktop_mimes(&[]), "");
        assert_eq!(
            desktop_mimes(&["text/x-foo".to_string(), "text/x-bar".to_string()]),
            "MimeType=text/x-foo;text/x-bar;"
        );
    }
}
