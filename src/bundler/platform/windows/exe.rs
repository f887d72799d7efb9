//! Inno Setup installer (.exe) bundler.

use super::{
    DIR_CHOOSER, INNO_SETUP_COMPILER, MENU_GROUP, MENU_HINT, PER_USER_INSTALL, SHORTCUT_HINT,
    UPGRADE_UUID, force_menu_hint, probe_version, require_tool, require_version, rtf,
    windows_preconditions,
};
use crate::bundler::{
    error::{Error, ErrorExt, Result},
    image::{self, AppImage, ImageLayout},
    params::{ParamId, ParamStore, standard},
    platform::{BuildContext, PackageType, PipelineState, PlatformBundler, ensure_supported},
    resources::{self, ResourceRequest, Substitutions},
    utils::{fs, process::ToolCommand},
};
use async_trait::async_trait;
use std::{
    fmt::Write as _,
    path::{Path, PathBuf},
};

pub(super) const INNO_VERSION_PATTERN: &str = r"Inno Setup (\d+)\.?(\d*)";

const PARAMETERS: &[ParamId] = &[
    ParamId::AppName,
    ParamId::MainJar,
    ParamId::MainClass,
    ParamId::Classpath,
    ParamId::Version,
    ParamId::Vendor,
    ParamId::Title,
    ParamId::Copyright,
    ParamId::Description,
    ParamId::LicenseFile,
    ParamId::InstallerName,
    ParamId::Icon,
    ParamId::PredefinedAppImage,
    ParamId::PredefinedRuntimeImage,
    ParamId::SecondaryLaunchers,
    ParamId::FileAssociations,
    ParamId::WinMenuHint,
    ParamId::WinShortcutHint,
    ParamId::WinMenuGroup,
    ParamId::WinPerUserInstall,
    ParamId::WinDirChooser,
    ParamId::WinUpgradeUuid,
    ParamId::WinInnoSetupCompiler,
];

/// Builds an Inno Setup installer.
#[derive(Clone, Copy, Debug, Default)]
pub struct WinExeBundler;

#[async_trait]
impl PlatformBundler for WinExeBundler {
    fn name(&self) -> &'static str {
        "EXE Installer"
    }

    fn description(&self) -> &'static str {
        "Windows executable installer compiled with Inno Setup"
    }

    fn package_type(&self) -> PackageType {
        PackageType::WinExe
    }

    fn parameters(&self) -> &'static [ParamId] {
        PARAMETERS
    }

    async fn validate(&self, ctx: &BuildContext, store: &mut ParamStore) -> Result<()> {
        ensure_supported(self, ctx)?;
        windows_preconditions(store)?;

        let iscc = require_tool(store, &INNO_SETUP_COMPILER, "Inno Setup compiler")?;
        let version =
            probe_version(ctx, &iscc, "/?", INNO_VERSION_PATTERN, "Inno Setup").await?;
        require_version(version, (5, 0), "Inno Setup")
    }

    async fn execute(
        &self,
        ctx: &BuildContext,
        store: &mut ParamStore,
        output_dir: &Path,
    ) -> Result<PathBuf> {
        image::predefined_image(store)?;
        force_menu_hint(store)?;

        let image_parent = store
            .require(&standard::BUILD_ROOT)?
            .join("windows")
            .join("win-exe.image");
        fs::create_dir_all(&image_parent, true).await?;
        store.put(ParamId::WorkingImageDir, image_parent.clone());

        let image = image::obtain(store, ImageLayout::Windows, &image_parent).await?;
        ctx.advance(PipelineState::ImageAssembled);

        let license = prepare_license(store, &image, &image_parent).await?;
        copy_association_icons(store, &image).await?;
        let subs = substitutions(store, &image, license)?;

        let name = store.require(&standard::APP_NAME)?;
        let iss = image_parent.join(format!("{name}.iss"));
        let request = ResourceRequest::for_store("Inno Setup project file", store)?
            .public_name(format!("{name}.iss"))
            .default_name("template.iss");
        resources::render_to(&request, &subs, &iss).await?;
        ctx.advance(PipelineState::Transformed);

        fs::create_dir_all(output_dir, false).await?;
        let iscc = store
            .fetch(&INNO_SETUP_COMPILER)?
            .unwrap_or_else(|| PathBuf::from("iscc"));
        ctx.exec(
            ToolCommand::new(iscc)
                .arg("/q")
                .arg(format!("/o{}", output_dir.display()))
                .arg(&iss)
                .current_dir(&image_parent),
        )
        .await?;

        let installer = fs::newest_file_with_extension(output_dir, "exe")?.ok_or_else(|| {
            Error::packaging(
                format!("Inno Setup did not produce an installer in {}", output_dir.display()),
                "Re-run with --verbose and inspect the generated .iss file",
            )
        })?;
        ctx.advance(PipelineState::Packaged);

        log::info!("✓ Created {}", installer.display());
        Ok(installer)
    }
}

/// Quotes a value for an Inno Setup directive when it has quotes or
/// surrounding whitespace.
pub fn escape_inno(value: &str) -> String {
    if value.contains('"') || value.trim() != value {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Copies the first license next to the image, converted to RTF.
async fn prepare_license(
    store: &mut ParamStore,
    image: &AppImage,
    image_parent: &Path,
) -> Result<Option<String>> {
    let licenses = store.fetch(&standard::LICENSE_FILE)?.unwrap_or_default();
    let Some(license) = licenses.first() else {
        return Ok(None);
    };

    let source = image.app_dir().join(license);
    let bytes = tokio::fs::read(&source)
        .await
        .fs_context("reading license file", &source)?;
    let file_name = Path::new(license)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "LICENSE".to_string());

    let (file_name, contents) = if rtf::is_rtf(&bytes) {
        (file_name, bytes)
    } else {
        let stem = Path::new(&file_name)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "LICENSE".to_string());
        let text = String::from_utf8_lossy(&bytes);
        (format!("{stem}.rtf"), rtf::text_to_rtf(&text).into_bytes())
    };

    let dest = image_parent.join(&file_name);
    tokio::fs::write(&dest, contents)
        .await
        .fs_context("writing license file", &dest)?;
    Ok(Some(file_name))
}

async fn copy_association_icons(store: &mut ParamStore, image: &AppImage) -> Result<()> {
    for mut association in store.fetch(&standard::FILE_ASSOCIATIONS)?.unwrap_or_default() {
        if let Some(icon) = association.fetch(&standard::FA_ICON)?
            && icon.is_file()
            && let Some(name) = icon.file_name()
        {
            fs::copy_file(&icon, &image.root.join(name)).await?;
        }
    }
    Ok(())
}

fn check_function(enabled: bool) -> String {
    let name = if enabled { "returnTrue" } else { "returnFalse" };
    name.to_string()
}

fn substitutions(
    store: &mut ParamStore,
    image: &AppImage,
    license: Option<String>,
) -> Result<Substitutions> {
    let name = store.require(&standard::APP_NAME)?;
    let per_user = store.fetch_or(&PER_USER_INSTALL, false)?;
    let chooser = store.fetch_or(&DIR_CHOOSER, false)?;
    let upgrade = store.require(&UPGRADE_UUID)?;
    let launcher = image.launcher_relative().display().to_string();

    let app_id: String = format!("{{{{{}}}", upgrade.to_string().to_uppercase())
        .chars()
        .take(126)
        .collect();

    let mut subs = Substitutions::new();
    let mut put = |key: &'static str, value: String| {
        subs.insert(key, Some(escape_inno(&value)));
    };
    put("PRODUCT_APP_IDENTIFIER", app_id);
    put("INSTALLER_NAME", name.clone());
    put("APPLICATION_VENDOR", store.require(&standard::VENDOR)?);
    put("APPLICATION_VERSION", store.require(&standard::VERSION)?);
    put("INSTALLER_FILE_NAME", store.require(&standard::INSTALLER_NAME)?);
    let image_dir = image
        .root
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or(name);
    put("LAUNCHER_NAME", image_dir);
    put("APPLICATION_LAUNCHER_FILENAME", launcher.clone());
    put(
        "APPLICATION_DESKTOP_SHORTCUT",
        check_function(store.fetch_or(&SHORTCUT_HINT, false)?),
    );
    put("APPLICATION_MENU_SHORTCUT", check_function(store.fetch_or(&MENU_HINT, false)?));
    put("APPLICATION_GROUP", store.require(&MENU_GROUP)?);
    put("APPLICATION_COMMENTS", store.fetch(&standard::TITLE)?.unwrap_or_default());
    put("APPLICATION_COPYRIGHT", store.fetch(&standard::COPYRIGHT)?.unwrap_or_default());
    put("APPLICATION_LICENSE_FILE", license.unwrap_or_default());
    put("DISABLE_DIR_PAGE", if chooser { "No" } else { "Yes" }.to_string());
    put(
        "APPLICATION_INSTALL_ROOT",
        if per_user { "{localappdata}" } else { "{pf}" }.to_string(),
    );
    put(
        "APPLICATION_INSTALL_PRIVILEGE",
        if per_user { "lowest" } else { "admin" }.to_string(),
    );
    put("ARCHITECTURE_BIT_MODE", "x64".to_string());
    put("APPLICATION_DESCRIPTION", store.require(&standard::DESCRIPTION)?);

    // Blocks are inserted verbatim.
    subs.insert("SECONDARY_LAUNCHERS", Some(secondary_launcher_icons(store, image)?));
    subs.insert(
        "FILE_ASSOCIATIONS",
        Some(file_association_registry(store, &launcher, per_user)?),
    );
    Ok(subs)
}

fn secondary_launcher_icons(store: &mut ParamStore, image: &AppImage) -> Result<String> {
    let mut out = String::new();
    for mut launcher in image::secondary_launcher_stores(store)? {
        let name = launcher.require(&standard::APP_NAME)?;
        let file = match image.launcher.extension() {
            Some(ext) => format!("{name}.{}", ext.to_string_lossy()),
            None => name.clone(),
        };
        let menu = check_function(launcher.fetch_or(&MENU_HINT, false)?);
        let desktop = check_function(launcher.fetch_or(&SHORTCUT_HINT, false)?);
        let _ = write!(
            out,
            "Name: \"{{group}}\\{name}\"; Filename: \"{{app}}\\{file}\"; Check: {menu}()\r\n\
             Name: \"{{commondesktop}}\\{name}\"; Filename: \"{{app}}\\{file}\"; Check: {desktop}()\r\n"
        );
    }
    Ok(out)
}

fn file_association_registry(
    store: &mut ParamStore,
    launcher: &str,
    per_user: bool,
) -> Result<String> {
    let associations = store.fetch(&standard::FILE_ASSOCIATIONS)?.unwrap_or_default();
    if associations.is_empty() {
        return Ok(String::new());
    }

    let fs_name = store.require(&standard::APP_FS_NAME)?;
    let (root, prefix) = if per_user {
        ("HKCU", "Software\\Classes\\")
    } else {
        ("HKCR", "")
    };

    let mut out = String::from("ChangesAssociations=yes\r\n\r\n[Registry]\r\n");
    for (index, mut association) in associations.into_iter().enumerate() {
        let entry = if index == 0 {
            format!("{fs_name}File")
        } else {
            format!("{fs_name}File{index}")
        };
        let description = association
            .fetch(&standard::FA_DESCRIPTION)?
            .unwrap_or_else(|| entry.clone())
            .replace('"', "");
        let content_type = association
            .fetch(&standard::FA_CONTENT_TYPE)?
            .and_then(|types| types.into_iter().next());

        for ext in association.fetch(&standard::FA_EXTENSIONS)?.unwrap_or_default() {
            let _ = write!(
                out,
                "Root: {root}; Subkey: \"{prefix}.{ext}\"; ValueType: string; ValueName: \"\"; ValueData: \"{entry}\"; Flags: uninsdeletevalue\r\n"
            );
            if let Some(content_type) = &content_type {
                let _ = write!(
                    out,
                    "Root: {root}; Subkey: \"{prefix}.{ext}\"; ValueType: string; ValueName: \"Content Type\"; ValueData: \"{content_type}\"; Flags: uninsdeletevalue\r\n"
                );
            }
        }
        let _ = write!(
            out,
            "Root: {root}; Subkey: \"{prefix}{entry}\"; ValueType: string; ValueName: \"\"; ValueData: \"{description}\"; Flags: uninsdeletekey\r\n"
        );
        if let Some(icon) = association.fetch(&standard::FA_ICON)?
            && let Some(icon_name) = icon.file_name()
        {
            let _ = write!(
                out,
                "Root: {root}; Subkey: \"{prefix}{entry}\\DefaultIcon\"; ValueType: string; ValueName: \"\"; ValueData: \"{{app}}\\{}\"\r\n",
                icon_name.to_string_lossy()
            );
        }
        let _ = write!(
            out,
            "Root: {root}; Subkey: \"{prefix}{entry}\\shell\\open\\command\"; ValueType: string; ValueName: \"\"; ValueData: \"\"\"{{app}}\\{launcher}\"\" \"\"%1\"\"\"\r\n"
        );
    }
    Ok(out)
}
