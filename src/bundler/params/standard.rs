//! Parameters shared by every bundler.
//!
//! Platform specific descriptors live next to their bundlers in
//! [`crate::bundler::platform`].

use super::{
    Param, ParamId, ParamStore, RelativeFileSet,
    convert::{parse_properties, split_tokens, split_with_escapes},
    manifest::resolve_launch_info,
};
use crate::bundler::error::{Error, ErrorExt, Result};
use chrono::Datelike;
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

/// Identity conversion.
pub fn string(raw: &str, _: &mut ParamStore) -> Result<String> {
    Ok(raw.to_string())
}

/// Path conversion.
pub fn path(raw: &str, _: &mut ParamStore) -> Result<PathBuf> {
    Ok(PathBuf::from(raw))
}

/// Strict boolean conversion.
pub fn boolean(raw: &str, _: &mut ParamStore) -> Result<bool> {
    Ok(super::convert::parse_bool(raw))
}

/// Flag conversion where a bare flag means `true`.
pub fn hint(raw: &str, _: &mut ParamStore) -> Result<bool> {
    Ok(super::convert::parse_hint(raw))
}

/// Comma / whitespace separated list conversion.
pub fn tokens(raw: &str, _: &mut ParamStore) -> Result<Vec<String>> {
    Ok(split_tokens(raw))
}

fn no(_: &mut ParamStore) -> Result<Option<bool>> {
    Ok(Some(false))
}

fn empty_list(_: &mut ParamStore) -> Result<Option<Vec<String>>> {
    Ok(Some(Vec::new()))
}

fn no_stores(_: &mut ParamStore) -> Result<Option<Vec<ParamStore>>> {
    Ok(Some(Vec::new()))
}

/// Input directory.
pub const INPUT: Param<PathBuf> = Param::new(ParamId::Input).with_convert(path);

/// Everything below the input directory.
pub const APP_RESOURCES: Param<RelativeFileSet> = Param::new(ParamId::AppResources)
    .with_default(app_resources_from_input)
    .with_convert(app_resources_from_string);

/// Application resources as a list.
pub const APP_RESOURCES_LIST: Param<Vec<RelativeFileSet>> = Param::new(ParamId::AppResourcesList)
    .with_default(app_resources_list_default)
    .with_convert(app_resources_list_from_string);

/// Jar holding the entry point.
pub const MAIN_JAR: Param<RelativeFileSet> = Param::new(ParamId::MainJar)
    .with_default(main_jar_default)
    .with_convert(main_jar_from_string);

/// Space separated class path.
pub const CLASSPATH: Param<String> = Param::new(ParamId::Classpath)
    .with_default(classpath_default)
    .with_convert(classpath_from_string);

/// Entry point class.
pub const MAIN_CLASS: Param<String> = Param::new(ParamId::MainClass)
    .with_default(main_class_default)
    .with_convert(string);

/// Application name, defaulting to the simple name of the main class.
pub const APP_NAME: Param<String> = Param::new(ParamId::AppName)
    .with_default(app_name_default)
    .with_convert(string);

/// Application name usable as a file name.
pub const APP_FS_NAME: Param<String> = Param::new(ParamId::AppFsName)
    .with_default(app_fs_name_default)
    .with_convert(string);

/// Icon file.
pub const ICON: Param<PathBuf> = Param::new(ParamId::Icon).with_convert(path);

/// Custom launcher.
pub const LAUNCHER: Param<PathBuf> = Param::new(ParamId::Launcher).with_convert(path);

/// Vendor.
pub const VENDOR: Param<String> = Param::new(ParamId::Vendor)
    .with_default(|_| Ok(Some("Unknown".to_string())))
    .with_convert(string);

/// Category.
pub const CATEGORY: Param<String> = Param::new(ParamId::Category)
    .with_default(|_| Ok(Some("Unknown".to_string())))
    .with_convert(string);

/// Description, defaulting to the application name.
pub const DESCRIPTION: Param<String> = Param::new(ParamId::Description)
    .with_default(description_default)
    .with_convert(string);

/// Copyright notice.
pub const COPYRIGHT: Param<String> = Param::new(ParamId::Copyright)
    .with_default(|_| Ok(Some(format!("Copyright (C) {}", chrono::Local::now().year()))))
    .with_convert(string);

/// Default application arguments.
pub const ARGUMENTS: Param<Vec<String>> = Param::new(ParamId::Arguments)
    .with_default(empty_list)
    .with_convert(|raw, _| Ok(split_with_escapes(raw)));

/// JVM options, one per blank-line separated block.
pub const JAVA_OPTIONS: Param<Vec<String>> = Param::new(ParamId::JavaOptions)
    .with_default(empty_list)
    .with_convert(|raw, _| {
        Ok(raw
            .split("\n\n")
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .map(str::to_string)
            .collect())
    });

/// JVM system properties.
pub const JVM_PROPERTIES: Param<BTreeMap<String, String>> = Param::new(ParamId::JvmProperties)
    .with_default(|_| Ok(Some(BTreeMap::new())))
    .with_convert(|raw, _| Ok(parse_properties(raw)));

/// Title, defaulting to the application name.
pub const TITLE: Param<String> = Param::new(ParamId::Title)
    .with_default(|store| store.fetch(&APP_NAME))
    .with_convert(string);

/// Version.
pub const VERSION: Param<String> = Param::new(ParamId::Version)
    .with_default(|_| Ok(Some("1.0".to_string())))
    .with_convert(string);

/// License files relative to the application resources.
pub const LICENSE_FILE: Param<Vec<String>> = Param::new(ParamId::LicenseFile)
    .with_default(empty_list)
    .with_convert(|raw, _| {
        Ok(raw
            .split(',')
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .map(str::to_string)
            .collect())
    });

/// Scratch directory, a fresh temporary directory unless given.
pub const BUILD_ROOT: Param<PathBuf> = Param::new(ParamId::BuildRoot)
    .with_default(build_root_default)
    .with_convert(path);

/// Platform configuration files.
pub const CONFIG_ROOT: Param<PathBuf> = Param::new(ParamId::ConfigRoot)
    .with_default(|store| build_root_child(store, "config"))
    .with_convert(path);

/// Intermediate images.
pub const IMAGES_ROOT: Param<PathBuf> = Param::new(ParamId::ImagesRoot)
    .with_default(|store| build_root_child(store, "images"))
    .with_convert(path);

/// Working image directory recorded by a bundler for cleanup.
pub const WORKING_IMAGE_DIR: Param<PathBuf> = Param::new(ParamId::WorkingImageDir).with_convert(path);

/// Application identifier, defaulting to the main class package.
pub const IDENTIFIER: Param<String> = Param::new(ParamId::Identifier)
    .with_default(identifier_default)
    .with_convert(string);

/// Preferences node, the identifier with dots turned into slashes.
pub const PREFERENCES_ID: Param<String> = Param::new(ParamId::PreferencesId)
    .with_default(|store| Ok(store.fetch(&IDENTIFIER)?.map(|id| id.replace('.', "/"))))
    .with_convert(string);

/// Verbose diagnostics; keeps intermediate images.
pub const VERBOSE: Param<bool> = Param::new(ParamId::Verbose)
    .with_default(no)
    .with_convert(hint);

/// Drop-in resource directory searched before bundled resources.
pub const DROP_IN_RESOURCES_ROOT: Param<PathBuf> = Param::new(ParamId::DropInResourcesRoot)
    .with_default(|_| Ok(Some(PathBuf::from("."))))
    .with_convert(path);

/// Installation directory.
pub const INSTALL_DIR: Param<String> = Param::new(ParamId::InstallDir).with_convert(string);

/// Installer base name.
pub const INSTALLER_NAME: Param<String> = Param::new(ParamId::InstallerName)
    .with_default(installer_name_default)
    .with_convert(string);

/// Existing application image.
pub const PREDEFINED_APP_IMAGE: Param<PathBuf> =
    Param::new(ParamId::PredefinedAppImage).with_convert(path);

/// Existing runtime image.
pub const PREDEFINED_RUNTIME_IMAGE: Param<PathBuf> =
    Param::new(ParamId::PredefinedRuntimeImage).with_convert(path);

/// Secondary launchers, one nested store each.
pub const SECONDARY_LAUNCHERS: Param<Vec<ParamStore>> =
    Param::new(ParamId::SecondaryLaunchers).with_default(no_stores);

/// File associations, one nested store each.
pub const FILE_ASSOCIATIONS: Param<Vec<ParamStore>> =
    Param::new(ParamId::FileAssociations).with_default(no_stores);

/// Extensions of a file association.
pub const FA_EXTENSIONS: Param<Vec<String>> = Param::new(ParamId::FaExtensions).with_convert(tokens);

/// Content types of a file association.
pub const FA_CONTENT_TYPE: Param<Vec<String>> =
    Param::new(ParamId::FaContentType).with_convert(tokens);

/// Description of a file association.
pub const FA_DESCRIPTION: Param<String> = Param::new(ParamId::FaDescription).with_convert(string);

/// Icon of a file association.
pub const FA_ICON: Param<PathBuf> = Param::new(ParamId::FaIcon).with_convert(path);

/// Single instance mode.
pub const SINGLETON: Param<bool> = Param::new(ParamId::Singleton)
    .with_default(no)
    .with_convert(hint);

fn app_resources_from_input(store: &mut ParamStore) -> Result<Option<RelativeFileSet>> {
    match store.fetch(&INPUT)? {
        Some(input) => Ok(Some(RelativeFileSet::from_dir(&input)?)),
        None => Ok(None),
    }
}

fn app_resources_from_string(raw: &str, _: &mut ParamStore) -> Result<RelativeFileSet> {
    RelativeFileSet::from_dir(Path::new(raw))
}

fn app_resources_list_default(store: &mut ParamStore) -> Result<Option<Vec<RelativeFileSet>>> {
    Ok(Some(store.fetch(&APP_RESOURCES)?.into_iter().collect()))
}

/// `dir/`, `dir/*` or a plain file per `:`/`;` separated entry.
fn app_resources_list_from_string(raw: &str, _: &mut ParamStore) -> Result<Vec<RelativeFileSet>> {
    let mut sets = Vec::new();
    for entry in raw.split([':', ';']).filter(|e| !e.is_empty()) {
        if let Some(dir) = entry.strip_suffix('*') {
            sets.push(RelativeFileSet::from_dir(Path::new(dir))?);
        } else if entry.ends_with('/') || entry.ends_with('\\') {
            sets.push(RelativeFileSet::from_dir(Path::new(entry))?);
        } else {
            sets.push(RelativeFileSet::single(Path::new(entry))?);
        }
    }
    Ok(sets)
}

fn main_jar_default(store: &mut ParamStore) -> Result<Option<RelativeFileSet>> {
    resolve_launch_info(store)?;
    Ok(store.peek(&MAIN_JAR))
}

/// Looks the jar up in the application resources first, then as a path.
fn main_jar_from_string(raw: &str, store: &mut ParamStore) -> Result<RelativeFileSet> {
    let relative = Path::new(raw);
    if relative.is_relative() {
        for set in store.fetch(&APP_RESOURCES_LIST)?.unwrap_or_default() {
            if set.base_directory().join(relative).is_file() {
                return Ok(RelativeFileSet::new(set.base_directory(), [relative]));
            }
        }
    }
    if relative.is_file() {
        return RelativeFileSet::single(relative);
    }
    Err(Error::config(
        format!("main jar {raw} does not exist"),
        "Pass a jar that exists in the input directory or an absolute path to one",
    ))
}

fn classpath_default(store: &mut ParamStore) -> Result<Option<String>> {
    resolve_launch_info(store)?;
    Ok(store.peek(&CLASSPATH))
}

fn classpath_from_string(raw: &str, _: &mut ParamStore) -> Result<String> {
    Ok(raw.replace([':', ';'], " "))
}

fn main_class_default(store: &mut ParamStore) -> Result<Option<String>> {
    resolve_launch_info(store)?;
    Ok(store.peek(&MAIN_CLASS))
}

fn app_name_default(store: &mut ParamStore) -> Result<Option<String>> {
    if let Some(image) = store.fetch(&PREDEFINED_APP_IMAGE)?
        && let Some(stem) = image.file_stem()
    {
        return Ok(Some(stem.to_string_lossy().into_owned()));
    }
    Ok(store
        .fetch(&MAIN_CLASS)?
        .map(|class| match class.rfind('.') {
            Some(idx) => class[idx + 1..].to_string(),
            None => class,
        }))
}

fn app_fs_name_default(store: &mut ParamStore) -> Result<Option<String>> {
    Ok(store.fetch(&APP_NAME)?.map(|name| {
        name.chars()
            .filter(|c| !c.is_whitespace() && !r"\/?:*<>|".contains(*c))
            .collect()
    }))
}

fn description_default(store: &mut ParamStore) -> Result<Option<String>> {
    Ok(Some(store.fetch(&APP_NAME)?.unwrap_or_else(|| "none".to_string())))
}

fn identifier_default(store: &mut ParamStore) -> Result<Option<String>> {
    Ok(store.fetch(&MAIN_CLASS)?.map(|class| match class.rfind('.') {
        Some(idx) if idx >= 1 => class[..idx].to_string(),
        _ => class,
    }))
}

fn installer_name_default(store: &mut ParamStore) -> Result<Option<String>> {
    let Some(name) = store.fetch(&APP_FS_NAME)? else {
        return Ok(None);
    };
    let version = store.require(&VERSION)?;
    Ok(Some(format!("{name}-{version}")))
}

fn build_root_default(_: &mut ParamStore) -> Result<Option<PathBuf>> {
    let root = std::env::temp_dir().join(format!("kodegen-package-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&root).fs_context("creating build root", &root)?;
    log::debug!("Created build root {}", root.display());
    Ok(Some(root))
}

fn build_root_child(store: &mut ParamStore, name: &str) -> Result<Option<PathBuf>> {
    let dir = store.require(&BUILD_ROOT)?.join(name);
    std::fs::create_dir_all(&dir).fs_context("creating directory", &dir)?;
    Ok(Some(dir))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_derive_from_main_class() {
        let mut store = ParamStore::new();
        store.put_raw(ParamId::MainClass, "com.example.tools.Hello");

        assert_eq!(store.fetch(&APP_NAME).unwrap().as_deref(), Some("Hello"));
        assert_eq!(store.fetch(&IDENTIFIER).unwrap().as_deref(), Some("com.example.tools"));
        assert_eq!(store.fetch(&PREFERENCES_ID).unwrap().as_deref(), Some("com/example/tools"));
        assert_eq!(store.fetch(&TITLE).unwrap().as_deref(), Some("Hello"));
    }

    #[test]
    fn test_fs_name_strips_illegal_characters() {
        let mut store = ParamStore::new();
        store.put_raw(ParamId::AppName, "My App: <Beta>?");
        assert_eq!(store.fetch(&APP_FS_NAME).unwrap().as_deref(), Some("MyAppBeta"));
    }

    #[test]
    fn test_verbose_bare_flag_is_true() {
        let mut store = ParamStore::new();
        store.put_raw(ParamId::Verbose, "null");
        assert_eq!(store.fetch(&VERBOSE).unwrap(), Some(true));

        let mut quiet = ParamStore::new();
        assert_eq!(quiet.fetch(&VERBOSE).unwrap(), Some(false));
    }

    #[test]
    fn test_license_files_split_on_commas() {
        let mut store = ParamStore::new();
        store.put_raw(ParamId::LicenseFile, "LICENSE, NOTICE.txt");
        assert_eq!(
            store.fetch(&LICENSE_FILE).unwrap().unwrap(),
            vec!["LICENSE".to_string(), "NOTICE.txt".to_string()]
        );
    }

    #[test]
    fn test_classpath_separators_normalized() {
        let mut store = ParamStore::new();
        store.put_raw(ParamId::Classpath, "lib/a.jar:lib/b.jar;lib/c.jar");
        assert_eq!(
            store.fetch(&CLASSPATH).unwrap().as_deref(),
            Some("lib/a.jar lib/b.jar lib/c.jar")
        );
    }

    #[test]
    fn test_no_main_class_means_no_name() {
        let mut store = ParamStore::new();
        assert_eq!(store.fetch(&APP_NAME).unwrap(), None);
        assert_eq!(store.fetch(&DESCRIPTION).unwrap().as_deref(), Some("none"));
    }
}
