//! Windows Installer package (.msi) bundler built with WiX.

use super::{
    DIR_CHOOSER, MENU_GROUP, MENU_HINT, PER_USER_INSTALL, PRODUCT_VERSION, SHORTCUT_HINT,
    UPGRADE_UUID, WIX_CANDLE, WIX_LIGHT, force_menu_hint, probe_version, require_tool,
    require_version, rtf, windows_preconditions,
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
use uuid::Uuid;

const WIX_VERSION_PATTERN: &str = r"version (\d+)\.(\d+)";

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
    ParamId::PredefinedAppImage,
    ParamId::PredefinedRuntimeImage,
    ParamId::FileAssociations,
    ParamId::WinMenuHint,
    ParamId::WinShortcutHint,
    ParamId::WinMenuGroup,
    ParamId::WinPerUserInstall,
    ParamId::WinDirChooser,
    ParamId::WinUpgradeUuid,
    ParamId::WinProductVersion,
    ParamId::WinWixCandle,
    ParamId::WinWixLight,
];

/// Builds a Windows Installer package.
#[derive(Clone, Copy, Debug, Default)]
pub struct WinMsiBundler;

#[async_trait]
impl PlatformBundler for WinMsiBundler {
    fn name(&self) -> &'static str {
        "MSI Installer"
    }

    fn description(&self) -> &'static str {
        "Windows Installer package compiled with the WiX toolset"
    }

    fn package_type(&self) -> PackageType {
        PackageType::WinMsi
    }

    fn parameters(&self) -> &'static [ParamId] {
        PARAMETERS
    }

    async fn validate(&self, ctx: &BuildContext, store: &mut ParamStore) -> Result<()> {
        ensure_supported(self, ctx)?;
        windows_preconditions(store)?;

        let version = store.require(&PRODUCT_VERSION)?;
        validate_product_version(&version)?;
        store.require(&UPGRADE_UUID)?;

        let candle = require_tool(store, &WIX_CANDLE, "WiX compiler (candle)")?;
        let light = require_tool(store, &WIX_LIGHT, "WiX linker (light)")?;
        for (tool, label) in [(candle, "WiX candle"), (light, "WiX light")] {
            let found = probe_version(ctx, &tool, "-?", WIX_VERSION_PATTERN, label).await?;
            require_version(found, (3, 0), label)?;
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
        force_menu_hint(store)?;

        let image_parent = store
            .require(&standard::BUILD_ROOT)?
            .join("windows")
            .join("win-msi.image");
        fs::create_dir_all(&image_parent, true).await?;
        store.put(ParamId::WorkingImageDir, image_parent.clone());

        let image = image::obtain(store, ImageLayout::Windows, &image_parent).await?;
        ctx.advance(PipelineState::ImageAssembled);

        let license = prepare_license(store, &image, &image_parent).await?;
        let subs = substitutions(store, &image, license.as_deref())?;

        let name = store.require(&standard::APP_NAME)?;
        let wxs = image_parent.join("main.wxs");
        let request = ResourceRequest::for_store("WiX project file", store)?
            .public_name(format!("{name}.wxs"))
            .default_name("template.wxs");
        resources::render_to(&request, &subs, &wxs).await?;
        ctx.advance(PipelineState::Transformed);

        let candle = store
            .fetch(&WIX_CANDLE)?
            .unwrap_or_else(|| PathBuf::from("candle"));
        let light = store
            .fetch(&WIX_LIGHT)?
            .unwrap_or_else(|| PathBuf::from("light"));
        let wixobj = image_parent.join("main.wixobj");

        ctx.exec(
            ToolCommand::new(candle)
                .arg("-nologo")
                .arg("-arch")
                .arg("x64")
                .arg("-out")
                .arg(&wixobj)
                .arg(&wxs)
                .current_dir(&image_parent),
        )
        .await?;

        fs::create_dir_all(output_dir, false).await?;
        let installer_name = store.require(&standard::INSTALLER_NAME)?;
        ctx.exec(
            ToolCommand::new(light)
                .arg("-nologo")
                .arg("-spdb")
                .arg("-ext")
                .arg("WixUIExtension")
                .arg("-out")
                .arg(output_dir.join(format!("{installer_name}.msi")))
                .arg(&wixobj)
                .current_dir(&image_parent),
        )
        .await?;

        let installer = fs::newest_file_with_extension(output_dir, "msi")?.ok_or_else(|| {
            Error::packaging(
                format!("WiX did not produce an installer in {}", output_dir.display()),
                "Re-run with --verbose and inspect the generated main.wxs",
            )
        })?;
        ctx.advance(PipelineState::Packaged);

        log::info!("✓ Created {}", installer.display());
        Ok(installer)
    }
}

/// Product versions are `major[.minor[.build]]` with limits 255, 255 and 65535.
pub fn validate_product_version(version: &str) -> Result<()> {
    const LIMITS: [(u32, &str); 3] = [(255, "major"), (255, "minor"), (65535, "build")];

    let invalid = |reason: String| {
        Error::config(
            format!("product version '{version}' is not valid for an MSI: {reason}"),
            "Pass --win-product-version as major[.minor[.build]], e.g. 1.2.3",
        )
    };

    let parts: Vec<&str> = version.split('.').collect();
    if parts.len() > LIMITS.len() {
        return Err(invalid("at most three components are allowed".to_string()));
    }
    for (part, (limit, label)) in parts.iter().zip(LIMITS) {
        let value: u32 = part
            .parse()
            .map_err(|_| invalid(format!("{label} component '{part}' is not a number")))?;
        if value > limit {
            return Err(invalid(format!("{label} component must not exceed {limit}")));
        }
    }
    Ok(())
}

fn xml_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

async fn prepare_license(
    store: &mut ParamStore,
    image: &AppImage,
    image_parent: &Path,
) -> Result<Option<PathBuf>> {
    let licenses = store.fetch(&standard::LICENSE_FILE)?.unwrap_or_default();
    let Some(license) = licenses.first() else {
        return Ok(None);
    };
    let source = image.app_dir().join(license);
    let bytes = tokio::fs::read(&source)
        .await
        .fs_context("reading license file", &source)?;
    let contents = if rtf::is_rtf(&bytes) {
        bytes
    } else {
        rtf::text_to_rtf(&String::from_utf8_lossy(&bytes)).into_bytes()
    };
    let dest = image_parent.join("license.rtf");
    tokio::fs::write(&dest, contents)
        .await
        .fs_context("writing license file", &dest)?;
    Ok(Some(dest))
}

/// Component and file ids generated for the image tree.
#[derive(Default)]
struct DirectoryTree {
    xml: String,
    component_refs: Vec<String>,
    launcher_file_id: Option<String>,
    counter: usize,
}

impl DirectoryTree {
    fn next_id(&mut self, prefix: &str) -> String {
        self.counter += 1;
        format!("{prefix}{}", self.counter)
    }
}

fn build_tree(
    dir: &Path,
    root: &Path,
    launcher: &Path,
    upgrade: &Uuid,
    progids: &str,
    depth: usize,
    tree: &mut DirectoryTree,
) -> Result<()> {
    let indent = "  ".repeat(depth + 5);
    let mut entries: Vec<_> = std::fs::read_dir(dir)
        .fs_context("listing image directory", dir)?
        .collect::<std::result::Result<_, _>>()?;
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let path = entry.path();
        let name = xml_escape(&entry.file_name().to_string_lossy());
        if path.is_dir() {
            let id = tree.next_id("d");
            let _ = writeln!(tree.xml, "{indent}<Directory Id=\"{id}\" Name=\"{name}\">");
            build_tree(&path, root, launcher, upgrade, progids, depth + 1, tree)?;
            let _ = writeln!(tree.xml, "{indent}</Directory>");
            continue;
        }

        let relative = path.strip_prefix(root)?.to_string_lossy().replace('\\', "/");
        let component = tree.next_id("c");
        let file = tree.next_id("f");
        let guid = Uuid::new_v5(upgrade, relative.as_bytes()).to_string().to_uppercase();
        let source = xml_escape(&path.display().to_string());

        let _ = writeln!(tree.xml, "{indent}<Component Id=\"{component}\" Guid=\"{guid}\" Win64=\"yes\">");
        let _ = writeln!(
            tree.xml,
            "{indent}  <File Id=\"{file}\" Name=\"{name}\" Source=\"{source}\" KeyPath=\"yes\"/>"
        );
        if path == launcher {
            tree.xml.push_str(&progids.replace("LAUNCHER_FILE_ID", &file));
            tree.launcher_file_id = Some(file);
        }
        let _ = writeln!(tree.xml, "{indent}</Component>");
        tree.component_refs.push(component);
    }
    Ok(())
}

fn file_association_progids(store: &mut ParamStore) -> Result<String> {
    let fs_name = store.require(&standard::APP_FS_NAME)?;
    let mut out = String::new();
    for (index, mut association) in store
        .fetch(&standard::FILE_ASSOCIATIONS)?
        .unwrap_or_default()
        .into_iter()
        .enumerate()
    {
        let description = xml_escape(
            &association
                .fetch(&standard::FA_DESCRIPTION)?
                .unwrap_or_else(|| format!("{fs_name} file")),
        );
        let content_type = association
            .fetch(&standard::FA_CONTENT_TYPE)?
            .and_then(|t| t.into_iter().next())
            .map(|t| format!(" ContentType=\"{}\"", xml_escape(&t)))
            .unwrap_or_default();
        let _ = writeln!(
            out,
            "            <ProgId Id=\"{fs_name}.File{index}\" Description=\"{description}\">"
        );
        for ext in association.fetch(&standard::FA_EXTENSIONS)?.unwrap_or_default() {
            let ext = xml_escape(&ext);
            let _ = writeln!(
                out,
                "              <Extension Id=\"{ext}\"{content_type} Advertise=\"no\">\n                <Verb Id=\"open\" Command=\"Open\" TargetFile=\"LAUNCHER_FILE_ID\" Argument=\"&quot;%1&quot;\"/>\n              </Extension>"
            );
        }
        let _ = writeln!(out, "            </ProgId>");
    }
    Ok(out)
}

fn shortcut_components(
    store: &mut ParamStore,
    launcher_file_id: &str,
    upgrade: &Uuid,
) -> Result<(String, Vec<String>)> {
    let name = xml_escape(&store.require(&standard::APP_NAME)?);
    let fs_name = store.require(&standard::APP_FS_NAME)?;
    let mut xml = String::new();
    let mut refs = Vec::new();

    let kinds = [
        (store.fetch_or(&MENU_HINT, false)?, "ProgramMenuSubfolder", "cMenuShortcut"),
        (store.fetch_or(&SHORTCUT_HINT, false)?, "DesktopFolder", "cDesktopShortcut"),
    ];
    for (enabled, directory, component) in kinds {
        if !enabled {
            continue;
        }
        let guid = Uuid::new_v5(upgrade, component.as_bytes()).to_string().to_uppercase();
        let _ = write!(
            xml,
            "    <DirectoryRef Id=\"{directory}\">\n\
             \x20     <Component Id=\"{component}\" Guid=\"{guid}\">\n\
             \x20       <Shortcut Id=\"{component}Link\" Name=\"{name}\" Target=\"[#{launcher_file_id}]\" WorkingDirectory=\"APPLICATIONFOLDER\"/>\n\
             \x20       <RemoveFolder Id=\"{component}Remove\" On=\"uninstall\"/>\n\
             \x20       <RegistryValue Root=\"HKCU\" Key=\"Software\\{fs_name}\" Name=\"{component}\" Type=\"integer\" Value=\"1\" KeyPath=\"yes\"/>\n\
             \x20     </Component>\n\
             \x20   </DirectoryRef>\n"
        );
        refs.push(component.to_string());
    }
    Ok((xml, refs))
}

fn substitutions(
    store: &mut ParamStore,
    image: &AppImage,
    license: Option<&Path>,
) -> Result<Substitutions> {
    let upgrade = store.require(&UPGRADE_UUID)?;
    let version = store.require(&PRODUCT_VERSION)?;
    let product = Uuid::new_v5(&upgrade, version.as_bytes());
    let per_user = store.fetch_or(&PER_USER_INSTALL, false)?;
    let chooser = store.fetch_or(&DIR_CHOOSER, false)?;

    let progids = file_association_progids(store)?;
    let mut tree = DirectoryTree::default();
    build_tree(&image.root, &image.root, &image.launcher, &upgrade, &progids, 0, &mut tree)?;
    let launcher_file_id = tree.launcher_file_id.clone().ok_or_else(|| {
        Error::packaging(
            format!("launcher {} is missing from the image", image.launcher.display()),
            "Check the launcher override and the predefined application image",
        )
    })?;
    let (shortcuts, shortcut_refs) = shortcut_components(store, &launcher_file_id, &upgrade)?;

    let component_refs = tree
        .component_refs
        .iter()
        .chain(&shortcut_refs)
        .map(|id| format!("      <ComponentRef Id=\"{id}\"/>"))
        .collect::<Vec<_>>()
        .join("\n");

    let mut ui = String::new();
    if let Some(license) = license {
        let _ = writeln!(
            ui,
            "    <WixVariable Id=\"WixUILicenseRtf\" Value=\"{}\"/>",
            xml_escape(&license.display().to_string())
        );
    }
    if chooser {
        let _ = writeln!(ui, "    <UIRef Id=\"WixUI_InstallDir\"/>");
    } else if license.is_some() {
        let _ = writeln!(ui, "    <UIRef Id=\"WixUI_Minimal\"/>");
    }

    let mut subs = Substitutions::new();
    let mut put = |key: &'static str, value: String| {
        subs.insert(key, Some(xml_escape(&value)));
    };
    put("PRODUCT_CODE", product.to_string().to_uppercase());
    put("PRODUCT_UPGRADE_CODE", upgrade.to_string().to_uppercase());
    put("APPLICATION_NAME", store.require(&standard::APP_NAME)?);
    put("APPLICATION_VERSION", version);
    put("APPLICATION_VENDOR", store.require(&standard::VENDOR)?);
    put("APPLICATION_DESCRIPTION", store.require(&standard::DESCRIPTION)?);
    put("APPLICATION_COMMENTS", store.fetch(&standard::TITLE)?.unwrap_or_default());
    put("APPLICATION_FS_NAME", store.require(&standard::APP_FS_NAME)?);
    put("APPLICATION_GROUP", store.require(&MENU_GROUP)?);
    put(
        "INSTALL_SCOPE",
        if per_user { "perUser" } else { "perMachine" }.to_string(),
    );
    put(
        "INSTALL_ROOT_FOLDER",
        if per_user { "LocalAppDataFolder" } else { "ProgramFiles64Folder" }.to_string(),
    );

    subs.insert("DIRECTORY_TREE", Some(tree.xml));
    subs.insert("SHORTCUT_COMPONENTS", Some(shortcuts));
    subs.insert("COMPONENT_REFS", Some(component_refs));
    subs.insert("UI_BLOCK", Some(ui));
    Ok(subs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_product_version_limits() {
        assert!(validate_product_version("1").is_ok());
        assert!(validate_product_version("1.2").is_ok());
        assert!(validate_product_version("255.255.65535").is_ok());
        assert!(validate_product_version("256.0").is_err());
        assert!(validate_product_version("1.256").is_err());
        assert!(validate_product_version("1.2.65536").is_err());
        assert!(validate_product_version("1.2.3.4").is_err());
        assert!(validate_product_version("1.0-beta").is_err());
        assert!(validate_product_version("").is_err());
    }

    #[test]
    fn test_product_code_is_stable_per_version() {
        let upgrade = Uuid::parse_str("6d1f3c2e-5a4b-4c3d-9e8f-0a1b2c3d4e5f").unwrap();
        assert_eq!(
            Uuid::new_v5(&upgrade, b"1.0"),
            Uuid::new_v5(&upgrade, b"1.0")
        );
        assert_ne!(
            Uuid::new_v5(&upgrade, b"1.0"),
            Uuid::new_v5(&upgrade, b"1.1")
        );
    }

    #[test]
    fn test_xml_escape() {
        assert_eq!(xml_escape("a & <b> \"c\""), "a &amp; &lt;b&gt; &quot;c&quot;");
    }
}
