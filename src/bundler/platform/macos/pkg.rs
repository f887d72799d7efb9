//! macOS flat installer package (.pkg) bundler.

use super::{
    DEVELOPER_ID_APP_KEY, DEVELOPER_ID_INSTALLER_KEY, SIGNING_KEYCHAIN, sign, signing_enabled,
};
use crate::bundler::{
    error::{Error, Result},
    image::{self, ImageLayout},
    params::{ParamId, ParamStore, standard},
    platform::{BuildContext, PackageType, PipelineState, PlatformBundler, checks, ensure_supported},
    utils::{fs, process::ToolCommand},
};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

const PARAMETERS: &[ParamId] = &[
    ParamId::AppName,
    ParamId::MainJar,
    ParamId::MainClass,
    ParamId::Classpath,
    ParamId::Version,
    ParamId::Identifier,
    ParamId::Vendor,
    ParamId::Copyright,
    ParamId::Description,
    ParamId::LicenseFile,
    ParamId::InstallDir,
    ParamId::InstallerName,
    ParamId::PredefinedAppImage,
    ParamId::PredefinedRuntimeImage,
    ParamId::FileAssociations,
    ParamId::MacSign,
    ParamId::MacSigningKeyUser,
    ParamId::MacSigningKeychain,
    ParamId::MacBundleSigningPrefix,
    ParamId::MacBundleName,
    ParamId::MacDeveloperIdAppKey,
    ParamId::MacDeveloperIdInstallerKey,
];

/// Builds a Developer ID distributable `.pkg`.
#[derive(Clone, Copy, Debug, Default)]
pub struct MacPkgBundler;

#[async_trait]
impl PlatformBundler for MacPkgBundler {
    fn name(&self) -> &'static str {
        "Mac PKG Installer"
    }

    fn description(&self) -> &'static str {
        "macOS flat installer package built with pkgbuild and productbuild"
    }

    fn package_type(&self) -> PackageType {
        PackageType::MacPkg
    }

    fn parameters(&self) -> &'static [ParamId] {
        PARAMETERS
    }

    async fn validate(&self, ctx: &BuildContext, store: &mut ParamStore) -> Result<()> {
        ensure_supported(self, ctx)?;
        checks::installer_preconditions(store)?;

        if signing_enabled(store)? && store.fetch(&DEVELOPER_ID_INSTALLER_KEY)?.is_none() {
            return Err(Error::config(
                "signing was requested but no Developer ID installer certificate was found",
                "Pass --mac-signing-key-user-name or --mac-signing-key-developer-id-installer",
            ));
        }
        Ok(())
    }

    async fn execute(
        &self,
        ctx: &BuildContext,
        store: &mut ParamStore,
        output_dir: &Path,
    ) -> Result<PathBuf> {
        image::predefined_image(store)?;

        let image_parent = store.require(&standard::IMAGES_ROOT)?.join("mac-pkg.image");
        fs::create_dir_all(&image_parent, true).await?;
        store.put(ParamId::WorkingImageDir, image_parent.clone());

        let app = image::obtain(store, ImageLayout::MacOs, &image_parent).await?;
        ctx.advance(PipelineState::ImageAssembled);

        let signing = signing_enabled(store)?;
        if signing {
            match store.fetch(&DEVELOPER_ID_APP_KEY)? {
                Some(key) => sign::sign_app_image(ctx, store, &app.root, &key, None).await?,
                None => log::warn!("No Developer ID application key found, the app stays unsigned"),
            }
        }
        ctx.advance(PipelineState::Transformed);

        let identifier = store.require(&standard::IDENTIFIER)?;
        let version = store.require(&standard::VERSION)?;
        let install_dir = store
            .fetch(&standard::INSTALL_DIR)?
            .unwrap_or_else(|| "/Applications".to_string());
        let fs_name = store.require(&standard::APP_FS_NAME)?;
        let installer_name = store.require(&standard::INSTALLER_NAME)?;

        let packages = store.require(&standard::CONFIG_ROOT)?.join("packages");
        fs::create_dir_all(&packages, false).await?;
        let component = packages.join(format!("{fs_name}-app.pkg"));

        ctx.exec(
            ToolCommand::new("pkgbuild")
                .arg("--component")
                .arg(&app.root)
                .arg("--install-location")
                .arg(&install_dir)
                .arg("--identifier")
                .arg(&identifier)
                .arg("--version")
                .arg(&version)
                .arg(&component),
        )
        .await?;

        fs::create_dir_all(output_dir, false).await?;
        let pkg = output_dir.join(format!("{installer_name}.pkg"));
        let mut productbuild = ToolCommand::new("productbuild")
            .arg("--package")
            .arg(&component);
        if signing && let Some(key) = store.fetch(&DEVELOPER_ID_INSTALLER_KEY)? {
            productbuild = productbuild.arg("--sign").arg(key);
            if let Some(keychain) = store.fetch(&SIGNING_KEYCHAIN)? {
                productbuild = productbuild.arg("--keychain").arg(keychain);
            }
        }
        ctx.exec(productbuild.arg(&pkg)).await?;
        ctx.advance(PipelineState::Packaged);

        log::info!("✓ Created {}", pkg.display());
        Ok(pkg)
    }
}
