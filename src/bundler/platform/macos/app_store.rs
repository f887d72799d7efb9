//! Mac App Store submission package bundler.

use super::{
    APP_STORE_APP_KEY, APP_STORE_ENTITLEMENTS, APP_STORE_PKG_KEY, APP_STORE_SUFFIX, SIGN,
    SIGNING_KEYCHAIN,
    sign::{self, Entitlements},
    signing_enabled,
};
use crate::bundler::{
    error::{Error, Result},
    image::{self, ImageLayout},
    params::{ParamId, ParamStore, standard},
    platform::{BuildContext, PackageType, PipelineState, PlatformBundler, checks, ensure_supported},
    resources::{self, ResourceRequest},
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
    ParamId::Category,
    ParamId::InstallerName,
    ParamId::PredefinedAppImage,
    ParamId::PredefinedRuntimeImage,
    ParamId::MacSign,
    ParamId::MacSigningKeyUser,
    ParamId::MacSigningKeychain,
    ParamId::MacBundleSigningPrefix,
    ParamId::MacBundleName,
    ParamId::MacAppStoreAppKey,
    ParamId::MacAppStorePkgKey,
    ParamId::MacAppStoreEntitlements,
    ParamId::MacAppStoreSuffix,
];

/// Builds a signed `.pkg` for App Store submission.
#[derive(Clone, Copy, Debug, Default)]
pub struct MacAppStoreBundler;

#[async_trait]
impl PlatformBundler for MacAppStoreBundler {
    fn name(&self) -> &'static str {
        "Mac App Store Ready Bundler"
    }

    fn description(&self) -> &'static str {
        "macOS package signed with App Store certificates"
    }

    fn package_type(&self) -> PackageType {
        PackageType::MacAppStore
    }

    fn parameters(&self) -> &'static [ParamId] {
        PARAMETERS
    }

    async fn validate(&self, ctx: &BuildContext, store: &mut ParamStore) -> Result<()> {
        ensure_supported(self, ctx)?;
        checks::installer_preconditions(store)?;

        if store.is_set(SIGN.id()) && !signing_enabled(store)? {
            return Err(Error::config(
                "App Store packages must be signed, but signing was disabled",
                "Remove --mac-sign=false",
            ));
        }
        if store.fetch(&APP_STORE_APP_KEY)?.is_none() {
            return Err(Error::config(
                "no App Store application signing key was found",
                "Pass --mac-signing-key-user-name or --mac-signing-key-app",
            ));
        }
        if store.fetch(&APP_STORE_PKG_KEY)?.is_none() {
            return Err(Error::config(
                "no App Store installer signing key was found",
                "Pass --mac-signing-key-user-name or --mac-signing-key-pkg",
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

        // Developer ID signing must not leak into an App Store build.
        store.clear(ParamId::MacDeveloperIdAppKey);

        let image_parent = store
            .require(&standard::IMAGES_ROOT)?
            .join("mac-app-store.image");
        fs::create_dir_all(&image_parent, true).await?;
        store.put(ParamId::WorkingImageDir, image_parent.clone());

        let app = image::obtain(store, ImageLayout::MacOs, &image_parent).await?;
        ctx.advance(PipelineState::ImageAssembled);

        let name = store.require(&standard::APP_NAME)?;
        let config_root = store.require(&standard::CONFIG_ROOT)?;
        let app_entitlements = config_root.join(format!("{name}.entitlements"));
        let inherit_entitlements = config_root.join(format!("{name}_Inherit.entitlements"));

        let custom = store
            .fetch(&APP_STORE_ENTITLEMENTS)?
            .filter(|path| path.is_file());
        let request = ResourceRequest::for_store("Mac App Store entitlements", store)?
            .public_name(format!("{name}.entitlements"))
            .override_file(custom)
            .default_name("MacAppStore.entitlements");
        resources::fetch_to(&request, &app_entitlements).await?;

        let request = ResourceRequest::for_store("Mac App Store inherited entitlements", store)?
            .public_name(format!("{name}_Inherit.entitlements"))
            .default_name("MacAppStore_Inherit.entitlements");
        resources::fetch_to(&request, &inherit_entitlements).await?;

        let app_key = store.require(&APP_STORE_APP_KEY)?;
        sign::sign_app_image(
            ctx,
            store,
            &app.root,
            &app_key,
            Some(Entitlements {
                app: &app_entitlements,
                inherit: &inherit_entitlements,
            }),
        )
        .await?;
        ctx.advance(PipelineState::Transformed);

        let pkg_key = store.require(&APP_STORE_PKG_KEY)?;
        let installer_name = store.require(&standard::INSTALLER_NAME)?;
        let suffix = store.fetch(&APP_STORE_SUFFIX)?.unwrap_or_default();

        fs::create_dir_all(output_dir, false).await?;
        let pkg = output_dir.join(format!("{installer_name}{suffix}.pkg"));

        let mut productbuild = ToolCommand::new("productbuild")
            .arg("--component")
            .arg(&app.root)
            .arg("/Applications")
            .arg("--sign")
            .arg(&pkg_key)
            .arg("--product")
            .arg(app.root.join("Contents/Info.plist"));
        if let Some(keychain) = store.fetch(&SIGNING_KEYCHAIN)? {
            productbuild = productbuild.arg("--keychain").arg(keychain);
        }
        ctx.exec(productbuild.arg(&pkg)).await?;
        ctx.advance(PipelineState::Packaged);

        log::info!("✓ Created {}", pkg.display());
        Ok(pkg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundler::{error::ErrorKind, platform::Platform, utils::process::ProcessRunner};
    use std::sync::Arc;

    fn store_with_image(image: &Path) -> ParamStore {
        let mut store = ParamStore::new();
        store.put(ParamId::PredefinedAppImage, image.to_path_buf());
        store.put(ParamId::MacAppStoreAppKey, "3rd Party Mac Developer Application: Acme");
        store.put(ParamId::MacAppStorePkgKey, "3rd Party Mac Developer Installer: Acme");
        store
    }

    #[tokio::test]
    async fn test_rejected_off_macos() {
        let image = tempfile::tempdir().unwrap();
        let ctx = BuildContext::new(Platform::Linux, Arc::new(ProcessRunner));
        let err = MacAppStoreBundler
            .validate(&ctx, &mut store_with_image(image.path()))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedPlatform);
    }

    #[tokio::test]
    async fn test_signing_cannot_be_disabled() {
        let image = tempfile::tempdir().unwrap();
        let ctx = BuildContext::new(Platform::MacOs, Arc::new(ProcessRunner));

        let mut store = store_with_image(image.path());
        assert!(MacAppStoreBundler.validate(&ctx, &mut store).await.is_ok());

        let mut store = store_with_image(image.path());
        store.put(ParamId::MacSign, false);
        let err = MacAppStoreBundler.validate(&ctx, &mut store).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }
}
