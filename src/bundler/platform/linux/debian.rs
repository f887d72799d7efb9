//! Debian package (.deb) bundler.
//!
//! The package tree is laid out as `dpkg-deb --build` expects it:
//!
//! ```text
//! <pkg>/
//! ├── DEBIAN/
//! │   ├── control
//! │   ├── copyright      (first license file, when given)
//! │   ├── postinst
//! │   └── prerm
//! └── opt/<pkg>/         (application image)
//! ```

use super::{
    MENU_GROUP, PACKAGE_DEPS, PACKAGE_NAME, debian_arch, desktop_integration, linux_preconditions,
    maintainer, probe_tool,
};
use crate::bundler::{
    error::{Error, Result},
    image::{self, AppImage, ImageLayout},
    params::{ParamId, ParamStore, standard},
    platform::{BuildContext, PackageType, PipelineState, PlatformBundler, ensure_supported},
    resources::{self, ResourceRequest, Substitutions},
    utils::{fs, process::ToolCommand},
};
use async_trait::async_trait;
use regex::Regex;
use std::path::{Path, PathBuf};

const PACKAGE_NAME_PATTERN: &str = r"^[a-z][a-z\d\+\-\.]+$";

const PARAMETERS: &[ParamId] = &[
    ParamId::AppName,
    ParamId::MainJar,
    ParamId::MainClass,
    ParamId::Classpath,
    ParamId::Version,
    ParamId::Vendor,
    ParamId::Title,
    ParamId::Description,
    ParamId::Copyright,
    ParamId::Category,
    ParamId::LicenseFile,
    ParamId::Icon,
    ParamId::PredefinedAppImage,
    ParamId::PredefinedRuntimeImage,
    ParamId::SecondaryLaunchers,
    ParamId::FileAssociations,
    ParamId::LinuxPackageName,
    ParamId::LinuxPackageDeps,
    ParamId::LinuxMaintainerEmail,
    ParamId::LinuxMenuGroup,
];

/// Builds a `.deb` with `dpkg-deb`.
#[derive(Clone, Copy, Debug, Default)]
pub struct DebBundler;

#[async_trait]
impl PlatformBundler for DebBundler {
    fn name(&self) -> &'static str {
        "DEB Bundler"
    }

    fn description(&self) -> &'static str {
        "Debian package built with dpkg-deb"
    }

    fn package_type(&self) -> PackageType {
        PackageType::Deb
    }

    fn parameters(&self) -> &'static [ParamId] {
        PARAMETERS
    }

    async fn validate(&self, ctx: &BuildContext, store: &mut ParamStore) -> Result<()> {
        ensure_supported(self, ctx)?;
        linux_preconditions(store)?;
        validate_package_name(&store.require(&PACKAGE_NAME)?)?;
        validate_version(&store.require(&standard::VERSION)?)?;
        probe_tool(ctx, "dpkg-deb", "dpkg").await
    }

    async fn execute(
        &self,
        ctx: &BuildContext,
        store: &mut ParamStore,
        output_dir: &Path,
    ) -> Result<PathBuf> {
        image::predefined_image(store)?;

        let package = store.require(&PACKAGE_NAME)?;
        let working = store
            .require(&standard::BUILD_ROOT)?
            .join("linux")
            .join("deb.image");
        fs::create_dir_all(&working, true).await?;
        store.put(ParamId::WorkingImageDir, working.clone());

        let package_root = working.join(&package);
        let install_root = format!("/opt/{package}");
        let image = image::obtain_at(
            store,
            ImageLayout::Linux,
            &package_root.join("opt").join(&package),
        )
        .await?;
        ctx.advance(PipelineState::ImageAssembled);

        let desktop = desktop_integration(store, &image, &package, &install_root).await?;
        let control_dir = package_root.join("DEBIAN");
        fs::create_dir_all(&control_dir, false).await?;
        copy_license(store, &image, &control_dir).await?;

        let mut subs = control_substitutions(store, &image, &package)?;
        subs.insert("DESKTOP_COMMANDS_INSTALL", Some(desktop.install));
        subs.insert("DESKTOP_COMMANDS_UNINSTALL", Some(desktop.uninstall));

        let request = ResourceRequest::for_store("Debian control file", store)?
            .public_name("control")
            .default_name("template.control");
        resources::render_to(&request, &subs, &control_dir.join("control")).await?;

        for script in ["postinst", "prerm"] {
            let request = ResourceRequest::for_store(format!("Debian {script} script"), store)?
                .public_name(script)
                .default_name(format!("template.{script}"));
            let dest = control_dir.join(script);
            resources::render_to(&request, &subs, &dest).await?;
            fs::set_executable(&dest).await?;
        }
        ctx.advance(PipelineState::Transformed);

        fs::create_dir_all(output_dir, false).await?;
        ctx.exec(
            ToolCommand::new("dpkg-deb")
                .arg("--root-owner-group")
                .arg("--build")
                .arg(&package_root)
                .arg(output_dir),
        )
        .await?;

        let deb = fs::newest_file_with_extension(output_dir, "deb")?.ok_or_else(|| {
            Error::packaging(
                format!("dpkg-deb did not produce a package in {}", output_dir.display()),
                "Re-run with --verbose and inspect the DEBIAN directory",
            )
        })?;
        ctx.advance(PipelineState::Packaged);

        log::info!("✓ Created {}", deb.display());
        Ok(deb)
    }
}

fn validate_package_name(name: &str) -> Result<()> {
    let re = Regex::new(PACKAGE_NAME_PATTERN)?;
    if re.is_match(name) {
        return Ok(());
    }
    Err(Error::config(
        format!("invalid Debian package name '{name}'"),
        "Package names use lower case letters, digits and + - . and start with a letter; \
         pass --linux-package-name",
    ))
}

fn validate_version(version: &str) -> Result<()> {
    if version.starts_with(|c: char| c.is_ascii_digit()) {
        return Ok(());
    }
    Err(Error::config(
        format!("invalid Debian package version '{version}'"),
        "Debian versions must start with a digit",
    ))
}

async fn copy_license(store: &mut ParamStore, image: &AppImage, control_dir: &Path) -> Result<()> {
    let licenses = store.fetch(&standard::LICENSE_FILE)?.unwrap_or_default();
    if let Some(license) = licenses.first() {
        fs::copy_file(&image.app_dir().join(license), &control_dir.join("copyright")).await?;
    }
    Ok(())
}

fn control_substitutions(
    store: &mut ParamStore,
    image: &AppImage,
    package: &str,
) -> Result<Substitutions> {
    let installed_kib = fs::path_size(&image.root)?.div_ceil(1024);
    let deps = store.fetch(&PACKAGE_DEPS)?.unwrap_or_default();
    let description = store.require(&standard::DESCRIPTION)?;
    let summary = store
        .fetch(&standard::TITLE)?
        .unwrap_or_else(|| description.clone());

    let mut subs = Substitutions::new();
    subs.insert("APPLICATION_PACKAGE", Some(package.to_string()));
    subs.insert("APPLICATION_VERSION", Some(store.require(&standard::VERSION)?));
    subs.insert(
        "APPLICATION_SECTION",
        Some(store.fetch(&MENU_GROUP)?.unwrap_or_else(|| "misc".to_string())),
    );
    subs.insert("APPLICATION_MAINTAINER", Some(maintainer(store)?));
    subs.insert("APPLICATION_ARCH", Some(debian_arch().to_string()));
    subs.insert("APPLICATION_INSTALLED_SIZE", Some(installed_kib.to_string()));
    subs.insert("APPLICATION_SUMMARY", Some(summary));
    subs.insert("APPLICATION_DESCRIPTION", Some(description));
    subs.insert("PACKAGE_DEPENDENCIES", Some(dependencies_line(&deps)));
    Ok(subs)
}

/// `Depends:` line for the control file, empty without dependencies.
fn dependencies_line(deps: &str) -> String {
    let deps = deps.trim();
    if deps.is_empty() {
        String::new()
    } else {
        format!("Depends: {deps}\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_package_names() {
        assert!(validate_package_name("hello").is_ok());
        assert!(validate_package_name("hello-world2.0+dfsg").is_ok());
        assert!(validate_package_name("Hello").is_err());
        assert!(validate_package_name("2hello").is_err());
        assert!(validate_package_name("h").is_err());
        assert!(validate_package_name("hello_world").is_err());
    }

    #[test]
    fn test_versions() {
        assert!(validate_version("1.0").is_ok());
        let err = validate_version("v1.0").unwrap_err();
        assert!(matches!(err.kind(), crate::bundler::error::ErrorKind::Configuration));
    }

    #[test]
    fn test_dependencies_line() {
        assert_eq!(dependencies_line(""), "");
        assert_eq!(dependencies_line(" libc6, libx11-6 "), "Depends: libc6, libx11-6\n");
    }
}
