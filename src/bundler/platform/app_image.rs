//! Application image bundler.
//!
//! Ships the runnable image directory itself: `<output>/<name>` on Linux and
//! Windows, `<output>/<name>.app` on macOS.

use super::{BuildContext, PackageType, PipelineState, Platform, PlatformBundler, ensure_supported, macos};
use crate::bundler::{
    error::{Error, Result},
    image::{self, ImageLayout},
    params::{ParamId, ParamStore, manifest, standard},
};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

const PARAMETERS: &[ParamId] = &[
    ParamId::Input,
    ParamId::AppResources,
    ParamId::AppResourcesList,
    ParamId::MainJar,
    ParamId::Classpath,
    ParamId::MainClass,
    ParamId::AppName,
    ParamId::Icon,
    ParamId::Launcher,
    ParamId::Arguments,
    ParamId::JavaOptions,
    ParamId::JvmProperties,
    ParamId::Version,
    ParamId::Identifier,
    ParamId::PreferencesId,
    ParamId::PredefinedAppImage,
    ParamId::PredefinedRuntimeImage,
    ParamId::SecondaryLaunchers,
    ParamId::Singleton,
    ParamId::DropInResourcesRoot,
    ParamId::Verbose,
    ParamId::MacSign,
    ParamId::MacSigningKeyUser,
    ParamId::MacSigningKeychain,
    ParamId::MacDeveloperIdAppKey,
    ParamId::MacBundleName,
];

/// Builds a bare application image.
#[derive(Clone, Copy, Debug, Default)]
pub struct AppImageBundler;

#[async_trait]
impl PlatformBundler for AppImageBundler {
    fn name(&self) -> &'static str {
        "Application Image"
    }

    fn description(&self) -> &'static str {
        "Self-contained application directory with launcher and runtime"
    }

    fn package_type(&self) -> PackageType {
        PackageType::AppImage
    }

    fn parameters(&self) -> &'static [ParamId] {
        PARAMETERS
    }

    async fn validate(&self, ctx: &BuildContext, store: &mut ParamStore) -> Result<()> {
        ensure_supported(self, ctx)?;
        store.require(&standard::APP_NAME)?;
        manifest::validate_launch_info(store)?;
        Ok(())
    }

    async fn execute(
        &self,
        ctx: &BuildContext,
        store: &mut ParamStore,
        output_dir: &Path,
    ) -> Result<PathBuf> {
        image::predefined_image(store)?;
        let layout = ImageLayout::for_platform(ctx.platform());
        let name = store.require(&standard::APP_NAME)?;

        let target = output_dir.join(layout.image_dir_name(&name));
        if target.exists() {
            return Err(Error::packaging(
                format!("application image {} already exists", target.display()),
                "Remove the existing image or choose another output directory",
            ));
        }

        let image = image::obtain(store, layout, output_dir).await?;
        ctx.advance(PipelineState::ImageAssembled);

        if ctx.platform() == Platform::MacOs && macos::signing_enabled(store)? {
            if let Some(key) = store.fetch(&macos::DEVELOPER_ID_APP_KEY)? {
                macos::sign::sign_app_image(ctx, store, &image.root, &key, None).await?;
            } else {
                log::warn!("Signing requested but no Developer ID application key was found");
            }
        }
        ctx.advance(PipelineState::Transformed);

        log::info!("✓ Created application image {}", image.root.display());
        Ok(image.root)
    }
}
