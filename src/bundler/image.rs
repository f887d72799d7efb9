//! Application image assembly.
//!
//! An application image is a runnable directory: a launcher, the application
//! files, an optional runtime and a `.cfg` file telling the launcher how to
//! start the JVM. Installer bundlers package an image; the `app-image`
//! bundler ships it as is.

use crate::bundler::{
    error::{Context, Error, ErrorExt, Result},
    params::{ParamId, ParamStore, standard},
    platform::{Platform, macos},
    resources::{self, ResourceRequest, Substitutions},
    utils::fs,
};
use std::{
    fmt::Write as _,
    path::{Path, PathBuf},
};

/// Directory layout of an application image.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ImageLayout {
    /// `bin/<name>`, `lib/app`, `lib/runtime`.
    Linux,
    /// `<name>.cmd`, `app`, `runtime`.
    Windows,
    /// `<name>.app/Contents/{MacOS,app,runtime}`.
    MacOs,
}

impl ImageLayout {
    /// Layout native to `platform`.
    pub fn for_platform(platform: Platform) -> Self {
        match platform {
            Platform::Windows => ImageLayout::Windows,
            Platform::MacOs => ImageLayout::MacOs,
            Platform::Linux | Platform::Unknown => ImageLayout::Linux,
        }
    }

    /// Name of the image directory for an application called `name`.
    pub fn image_dir_name(&self, name: &str) -> String {
        match self {
            ImageLayout::MacOs => format!("{name}.app"),
            _ => name.to_string(),
        }
    }

    fn app_dir(&self, root: &Path) -> PathBuf {
        match self {
            ImageLayout::Linux => root.join("lib/app"),
            ImageLayout::Windows => root.join("app"),
            ImageLayout::MacOs => root.join("Contents/app"),
        }
    }

    fn runtime_dir(&self, root: &Path) -> PathBuf {
        match self {
            ImageLayout::Linux => root.join("lib/runtime"),
            ImageLayout::Windows => root.join("runtime"),
            ImageLayout::MacOs => root.join("Contents/runtime"),
        }
    }

    fn launcher_dir(&self, root: &Path) -> PathBuf {
        match self {
            ImageLayout::Linux => root.join("bin"),
            ImageLayout::Windows => root.to_path_buf(),
            ImageLayout::MacOs => root.join("Contents/MacOS"),
        }
    }

    fn icon_dir(&self, root: &Path) -> PathBuf {
        match self {
            ImageLayout::Linux => root.join("lib"),
            ImageLayout::Windows => root.to_path_buf(),
            ImageLayout::MacOs => root.join("Contents/Resources"),
        }
    }

    /// Launcher directory → application directory, as used by the launcher script.
    fn app_dir_from_launcher(&self) -> &'static str {
        match self {
            ImageLayout::Linux => "../lib/app",
            ImageLayout::Windows => "app",
            ImageLayout::MacOs => "../app",
        }
    }

    /// Launcher directory → runtime directory.
    fn runtime_dir_from_launcher(&self) -> &'static str {
        match self {
            ImageLayout::Linux => "../lib/runtime",
            ImageLayout::Windows => "runtime",
            ImageLayout::MacOs => "../runtime",
        }
    }

    /// Runtime location recorded in the `.cfg` file, relative to the app dir.
    fn cfg_runtime(&self) -> &'static str {
        match self {
            ImageLayout::Windows => r"$APPDIR\..\runtime",
            _ => "$APPDIR/../runtime",
        }
    }

    fn classpath_separator(&self) -> &'static str {
        match self {
            ImageLayout::Windows => ";",
            _ => ":",
        }
    }

    fn default_launcher(&self) -> &'static str {
        match self {
            ImageLayout::Windows => "launcher.cmd",
            _ => "launcher.sh",
        }
    }
}

/// An assembled or copied application image.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppImage {
    /// Layout of the tree.
    pub layout: ImageLayout,
    /// Image root (`<name>` or `<name>.app`).
    pub root: PathBuf,
    /// Application name.
    pub name: String,
    /// Main launcher.
    pub launcher: PathBuf,
}

impl AppImage {
    /// Application files directory.
    pub fn app_dir(&self) -> PathBuf {
        self.layout.app_dir(&self.root)
    }

    /// Launcher file name relative to the image root.
    pub fn launcher_relative(&self) -> PathBuf {
        self.launcher
            .strip_prefix(&self.root)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| self.launcher.clone())
    }

    fn existing(layout: ImageLayout, root: PathBuf, name: String) -> Self {
        let launcher_dir = layout.launcher_dir(&root);
        let launcher = match layout {
            ImageLayout::Windows => ["exe", "cmd", "bat"]
                .iter()
                .map(|ext| launcher_dir.join(format!("{name}.{ext}")))
                .find(|p| p.is_file())
                .unwrap_or_else(|| launcher_dir.join(format!("{name}.cmd"))),
            _ => launcher_dir.join(&name),
        };
        Self {
            layout,
            root,
            name,
            launcher,
        }
    }
}

/// Returns the predefined application image, failing when it was given but
/// does not exist.
pub fn predefined_image(store: &mut ParamStore) -> Result<Option<PathBuf>> {
    let Some(image) = store.fetch(&standard::PREDEFINED_APP_IMAGE)? else {
        return Ok(None);
    };
    if !image.is_dir() {
        return Err(Error::config(
            format!("predefined application image {} does not exist", image.display()),
            "Pass the directory of an existing application image",
        ));
    }
    Ok(Some(image))
}

/// Copies the predefined image into `parent` when one is given, otherwise
/// assembles a fresh image there. The image root is `parent/<name>` (or
/// `<name>.app` on macOS).
pub async fn obtain(store: &mut ParamStore, layout: ImageLayout, parent: &Path) -> Result<AppImage> {
    let name = store.require(&standard::APP_NAME)?;
    obtain_at(store, layout, &parent.join(layout.image_dir_name(&name))).await
}

/// Like [`obtain`], with an explicit image root.
pub async fn obtain_at(store: &mut ParamStore, layout: ImageLayout, root: &Path) -> Result<AppImage> {
    let Some(predefined) = predefined_image(store)? else {
        return assemble_at(store, layout, root).await;
    };

    let name = store.require(&standard::APP_NAME)?;
    fs::remove_dir_all(root).await?;
    log::info!("Using predefined application image {}", predefined.display());
    fs::copy_dir(&predefined, root)
        .await
        .with_context(|| format!("failed to copy application image {}", predefined.display()))?;
    Ok(AppImage::existing(layout, root.to_path_buf(), name))
}

/// Builds a fresh image rooted at `root`.
pub async fn assemble_at(store: &mut ParamStore, layout: ImageLayout, root: &Path) -> Result<AppImage> {
    let name = store.require(&standard::APP_NAME)?;
    let root = root.to_path_buf();
    log::info!("Assembling application image {}", root.display());

    fs::create_dir_all(&root, true).await?;
    let app_dir = layout.app_dir(&root);
    fs::create_dir_all(&app_dir, false).await?;

    copy_app_resources(store, &app_dir).await?;

    if let Some(runtime) = store.fetch(&standard::PREDEFINED_RUNTIME_IMAGE)? {
        let runtime_dir = layout.runtime_dir(&root);
        log::info!("Copying runtime {}", runtime.display());
        fs::copy_dir(&runtime, &runtime_dir)
            .await
            .with_context(|| format!("failed to copy runtime {}", runtime.display()))?;
    }

    let launcher = write_launcher(store, layout, &root, &name).await?;
    let icon = copy_icon(store, layout, &root, &name).await?;

    let cfg = app_dir.join(format!("{name}.cfg"));
    write_cfg(store, layout, &cfg).await?;

    if layout == ImageLayout::MacOs {
        write_info_plist(store, &root, &name, icon.as_deref())?;
        let pkg_info = root.join("Contents/PkgInfo");
        tokio::fs::write(&pkg_info, "APPL????")
            .await
            .fs_context("writing PkgInfo", &pkg_info)?;
    }

    for mut launcher_store in secondary_launcher_stores(store)? {
        let secondary = launcher_store.require(&standard::APP_NAME)?;
        log::info!("Adding secondary launcher {}", secondary);
        write_launcher(&mut launcher_store, layout, &root, &secondary).await?;
        copy_icon(&mut launcher_store, layout, &root, &secondary).await?;
        write_cfg(&mut launcher_store, layout, &app_dir.join(format!("{secondary}.cfg"))).await?;
    }

    log::info!("✓ Application image ready at {}", root.display());
    Ok(AppImage {
        layout,
        root,
        name,
        launcher,
    })
}

/// Parameter stores for the secondary launchers, each layered over the main
/// store so unset values fall back to the application's.
pub fn secondary_launcher_stores(store: &mut ParamStore) -> Result<Vec<ParamStore>> {
    let launchers = store.fetch(&standard::SECONDARY_LAUNCHERS)?.unwrap_or_default();
    Ok(launchers
        .iter()
        .map(|overlay| {
            let mut merged = store.clone();
            merged.remove(ParamId::SecondaryLaunchers);
            merged.remove(ParamId::AppFsName);
            merged.overlay(overlay);
            merged
        })
        .collect())
}

async fn copy_app_resources(store: &mut ParamStore, app_dir: &Path) -> Result<()> {
    let resources = store.fetch(&standard::APP_RESOURCES_LIST)?.unwrap_or_default();
    for set in &resources {
        for file in set.included_files() {
            fs::copy_file(&set.base_directory().join(file), &app_dir.join(file)).await?;
        }
    }

    // The main jar may live outside the input directory.
    if let Some(jar) = store.fetch(&standard::MAIN_JAR)? {
        for file in jar.included_files() {
            let dest = app_dir.join(file);
            if !dest.exists() {
                fs::copy_file(&jar.base_directory().join(file), &dest).await?;
            }
        }
    }
    Ok(())
}

async fn write_launcher(
    store: &mut ParamStore,
    layout: ImageLayout,
    root: &Path,
    name: &str,
) -> Result<PathBuf> {
    let custom = store.fetch(&standard::LAUNCHER)?;
    let file_name = match layout {
        ImageLayout::Windows => {
            let ext = custom
                .as_ref()
                .and_then(|c| c.extension())
                .map(|e| e.to_string_lossy().into_owned())
                .unwrap_or_else(|| "cmd".to_string());
            format!("{name}.{ext}")
        }
        _ => name.to_string(),
    };
    let launcher = layout.launcher_dir(root).join(file_name);

    let request = ResourceRequest::for_store("launcher", store)?
        .public_name(format!("{name}.launcher"))
        .override_file(custom)
        .default_name(layout.default_launcher());
    let resolved = resources::resolve(&request).await?;

    let bytes = if resolved.is_template() {
        let mut subs = Substitutions::new();
        subs.insert("LAUNCHER_NAME", Some(name.to_string()));
        subs.insert("APP_DIR_RELATIVE", Some(layout.app_dir_from_launcher().to_string()));
        subs.insert(
            "RUNTIME_DIR_RELATIVE",
            Some(layout.runtime_dir_from_launcher().to_string()),
        );
        resources::render(&resolved.text(), &subs).into_bytes()
    } else {
        resolved.bytes
    };

    if let Some(parent) = launcher.parent() {
        fs::create_dir_all(parent, false).await?;
    }
    tokio::fs::write(&launcher, bytes)
        .await
        .fs_context("writing launcher", &launcher)?;
    fs::set_executable(&launcher).await?;
    Ok(launcher)
}

async fn copy_icon(
    store: &mut ParamStore,
    layout: ImageLayout,
    root: &Path,
    name: &str,
) -> Result<Option<PathBuf>> {
    let Some(icon) = store.fetch(&standard::ICON)? else {
        return Ok(None);
    };
    if !icon.is_file() {
        log::warn!("Icon {} does not exist, using none", icon.display());
        return Ok(None);
    }
    let ext = icon
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_else(|| "png".to_string());
    let dest = layout.icon_dir(root).join(format!("{name}.{ext}"));
    fs::copy_file(&icon, &dest).await?;
    Ok(Some(dest))
}

/// Renders the launcher configuration for the application in `store`.
pub fn cfg_contents(store: &mut ParamStore, layout: ImageLayout) -> Result<String> {
    let mut out = String::new();
    let name = store.require(&standard::APP_NAME)?;
    let version = store.require(&standard::VERSION)?;
    let preferences = store.fetch(&standard::PREFERENCES_ID)?.unwrap_or_default();
    let identifier = store.fetch(&standard::IDENTIFIER)?.unwrap_or_default();
    let classpath = store.fetch(&standard::CLASSPATH)?.unwrap_or_default();
    let singleton = store.fetch_or(&standard::SINGLETON, false)?;
    let main_jar = store.fetch(&standard::MAIN_JAR)?;
    let main_class = store.fetch(&standard::MAIN_CLASS)?;

    let classpath = classpath
        .split([' ', ':', ';'])
        .filter(|e| !e.is_empty())
        .collect::<Vec<_>>()
        .join(layout.classpath_separator());

    // String formatting into a String cannot fail.
    let _ = writeln!(out, "[Application]");
    let _ = writeln!(out, "app.name={name}");
    let _ = writeln!(out, "app.version={version}");
    let _ = writeln!(out, "app.preferences.id={preferences}");
    let _ = writeln!(out, "app.runtime={}", layout.cfg_runtime());
    let _ = writeln!(out, "app.identifier={identifier}");
    let _ = writeln!(out, "app.classpath={classpath}");
    let _ = writeln!(
        out,
        "app.application.instance={}",
        if singleton { "single" } else { "multiple" }
    );
    if let Some(jar) = main_jar.as_ref().and_then(|set| set.included_files().next()) {
        let _ = writeln!(out, "app.mainjar={}", jar.display());
    }
    if let Some(class) = main_class {
        let _ = writeln!(out, "app.mainclass={}", class.replace('.', "/"));
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "[JVMOptions]");
    for option in store.fetch(&standard::JAVA_OPTIONS)?.unwrap_or_default() {
        let _ = writeln!(out, "{option}");
    }
    for (key, value) in store.fetch(&standard::JVM_PROPERTIES)?.unwrap_or_default() {
        let _ = writeln!(out, "-D{key}={value}");
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "[ArgOptions]");
    for arg in store.fetch(&standard::ARGUMENTS)?.unwrap_or_default() {
        match arg.strip_suffix('=') {
            Some(stem) if !stem.contains('=') => {
                let _ = writeln!(out, "{stem}\\=");
            }
            _ => {
                let _ = writeln!(out, "{arg}");
            }
        }
    }
    Ok(out)
}

async fn write_cfg(store: &mut ParamStore, layout: ImageLayout, cfg: &Path) -> Result<()> {
    let contents = cfg_contents(store, layout)?;
    tokio::fs::write(cfg, contents)
        .await
        .fs_context("writing launcher configuration", cfg)
}

fn write_info_plist(
    store: &mut ParamStore,
    root: &Path,
    name: &str,
    icon: Option<&Path>,
) -> Result<()> {
    use plist::{Dictionary, Value};

    let identifier = store.fetch(&standard::IDENTIFIER)?.unwrap_or_else(|| name.to_string());
    let version = store.require(&standard::VERSION)?;
    let bundle_name = store
        .fetch(&macos::BUNDLE_NAME)?
        .unwrap_or_else(|| name.to_string());

    let mut dict = Dictionary::new();
    dict.insert("CFBundleDevelopmentRegion".into(), "English".into());
    dict.insert("CFBundleExecutable".into(), name.into());
    dict.insert("CFBundleIdentifier".into(), identifier.into());
    dict.insert("CFBundleInfoDictionaryVersion".into(), "6.0".into());
    dict.insert("CFBundleName".into(), bundle_name.into());
    dict.insert("CFBundlePackageType".into(), "APPL".into());
    dict.insert("CFBundleShortVersionString".into(), version.clone().into());
    dict.insert("CFBundleSignature".into(), "????".into());
    dict.insert("CFBundleVersion".into(), version.into());
    dict.insert("NSHighResolutionCapable".into(), true.into());

    if let Some(filename) = icon.and_then(Path::file_name) {
        dict.insert(
            "CFBundleIconFile".into(),
            filename.to_string_lossy().into_owned().into(),
        );
    }
    if let Some(category) = store.fetch(&standard::CATEGORY)? {
        dict.insert("LSApplicationCategoryType".into(), category.into());
    }
    if let Some(copyright) = store.fetch(&standard::COPYRIGHT)? {
        dict.insert("NSHumanReadableCopyright".into(), copyright.into());
    }

    let mut document_types = Vec::new();
    for mut association in store.fetch(&standard::FILE_ASSOCIATIONS)?.unwrap_or_default() {
        let mut entry = Dictionary::new();
        let extensions = association.fetch(&standard::FA_EXTENSIONS)?.unwrap_or_default();
        entry.insert(
            "CFBundleTypeExtensions".into(),
            Value::Array(extensions.into_iter().map(Value::from).collect()),
        );
        let content_types = association.fetch(&standard::FA_CONTENT_TYPE)?.unwrap_or_default();
        if !content_types.is_empty() {
            entry.insert(
                "CFBundleTypeMIMETypes".into(),
                Value::Array(content_types.into_iter().map(Value::from).collect()),
            );
        }
        if let Some(description) = association.fetch(&standard::FA_DESCRIPTION)? {
            entry.insert("CFBundleTypeName".into(), description.into());
        }
        entry.insert("CFBundleTypeRole".into(), "Editor".into());
        document_types.push(Value::Dictionary(entry));
    }
    if !document_types.is_empty() {
        dict.insert("CFBundleDocumentTypes".into(), Value::Array(document_types));
    }

    let plist_path = root.join("Contents/Info.plist");
    Value::Dictionary(dict)
        .to_file_xml(&plist_path)
        .map_err(Error::Plist)?;
    Ok(())
}
