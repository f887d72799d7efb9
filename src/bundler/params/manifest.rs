//! Entry point discovery from jar manifests.
//!
//! `main-class`, `main-jar` and `classpath` are resolved together: the first
//! jar with a manifest wins and all three entries are cached from that one
//! inspection.

use super::{ParamId, ParamStore, RelativeFileSet, standard};
use crate::bundler::error::{Error, Result};
use std::{
    collections::BTreeMap,
    fs::File,
    io::Read,
    path::{Path, PathBuf},
};

const MANIFEST_PATH: &str = "META-INF/MANIFEST.MF";

/// What a manifest sniff found.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LaunchInfo {
    /// `Main-Class` attribute, if any.
    pub main_class: Option<String>,
    /// The jar the manifest came from.
    pub main_jar: Option<RelativeFileSet>,
    /// `Class-Path` attribute, empty when the manifest has none.
    pub classpath: Option<String>,
}

/// Parses the main section of a manifest.
///
/// Continuation lines start with a single space and are appended to the
/// previous attribute value.
pub fn parse_manifest(text: &str) -> BTreeMap<String, String> {
    let mut attributes: BTreeMap<String, String> = BTreeMap::new();
    let mut last: Option<String> = None;

    for line in text.lines() {
        if line.trim().is_empty() {
            break;
        }
        if let Some(continuation) = line.strip_prefix(' ') {
            if let Some(key) = &last
                && let Some(value) = attributes.get_mut(key)
            {
                value.push_str(continuation);
            }
            continue;
        }
        if let Some((key, value)) = line.split_once(':') {
            let key = key.trim().to_string();
            attributes.insert(key.clone(), value.trim_start().to_string());
            last = Some(key);
        }
    }
    attributes
}

/// Reads the main manifest attributes of a jar.
///
/// Returns `None` for archives without a manifest and for files that are not
/// readable zip archives.
pub fn read_manifest(jar: &Path) -> Result<Option<BTreeMap<String, String>>> {
    let file = match File::open(jar) {
        Ok(file) => file,
        Err(e) => {
            log::debug!("Skipping {}: {}", jar.display(), e);
            return Ok(None);
        }
    };
    let mut archive = match zip::ZipArchive::new(file) {
        Ok(archive) => archive,
        Err(e) => {
            log::debug!("Skipping {}: not a jar ({})", jar.display(), e);
            return Ok(None);
        }
    };

    let mut text = String::new();
    match archive.by_name(MANIFEST_PATH) {
        Ok(mut entry) => {
            entry.read_to_string(&mut text)?;
        }
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(e.into()),
    }
    Ok(Some(parse_manifest(&text)))
}

/// Finds the first jar with a manifest among the candidates implied by the
/// store: the main jar, else the classpath entries, else every jar in the
/// application resources. Does not modify the store beyond resolving those
/// inputs.
pub fn sniff_launch_info(store: &mut ParamStore) -> Result<LaunchInfo> {
    let mut candidates: Vec<(RelativeFileSet, PathBuf)> = Vec::new();

    if store.is_set(ParamId::MainJar) {
        if let Some(jar) = store.fetch(&standard::MAIN_JAR)? {
            for path in jar.resolved_files() {
                candidates.push((jar.clone(), path));
            }
        }
    } else if store.is_set(ParamId::Classpath) {
        let classpath = store.fetch(&standard::CLASSPATH)?.unwrap_or_default();
        let resources = store.fetch(&standard::APP_RESOURCES_LIST)?.unwrap_or_default();
        for entry in classpath.split([' ', ':', ';']).filter(|e| !e.is_empty()) {
            for set in &resources {
                let path = set.base_directory().join(entry);
                if path.is_file() {
                    candidates.push((RelativeFileSet::new(set.base_directory(), [entry]), path));
                }
            }
        }
    } else {
        let resources = store.fetch(&standard::APP_RESOURCES_LIST)?.unwrap_or_default();
        for set in &resources {
            for file in set.included_files() {
                if file.extension().is_some_and(|ext| ext == "jar") {
                    candidates.push((
                        RelativeFileSet::new(set.base_directory(), [file]),
                        set.base_directory().join(file),
                    ));
                }
            }
        }
    }

    for (jar, path) in candidates {
        if let Some(attributes) = read_manifest(&path)? {
            log::debug!("Using manifest of {}", path.display());
            return Ok(LaunchInfo {
                main_class: attributes.get("Main-Class").cloned(),
                main_jar: Some(jar),
                classpath: Some(attributes.get("Class-Path").cloned().unwrap_or_default()),
            });
        }
    }
    Ok(LaunchInfo::default())
}

/// Sniffs once and caches whichever of main class, main jar and classpath
/// are not already present.
pub fn resolve_launch_info(store: &mut ParamStore) -> Result<()> {
    if store.contains(ParamId::MainClass)
        && store.contains(ParamId::MainJar)
        && store.contains(ParamId::Classpath)
    {
        return Ok(());
    }

    let info = sniff_launch_info(store)?;
    if !store.contains(ParamId::MainJar)
        && let Some(jar) = info.main_jar
    {
        store.put(ParamId::MainJar, jar);
    }
    if !store.contains(ParamId::Classpath)
        && let Some(classpath) = info.classpath
    {
        store.put(ParamId::Classpath, classpath);
    }
    if !store.contains(ParamId::MainClass)
        && let Some(main_class) = info.main_class
    {
        store.put(ParamId::MainClass, main_class);
    }
    Ok(())
}

/// Ensures an entry point is known, unless a predefined image makes it moot.
pub fn validate_launch_info(store: &mut ParamStore) -> Result<()> {
    let has_main_class = store.is_set(ParamId::MainClass);
    let has_main_jar = store.is_set(ParamId::MainJar);
    let has_classpath = store.is_set(ParamId::Classpath);

    if store.is_set(ParamId::PredefinedAppImage)
        || (has_main_class && has_main_jar && has_classpath)
    {
        return Ok(());
    }

    resolve_launch_info(store)?;
    if store.is_set(ParamId::MainClass) {
        return Ok(());
    }

    if has_main_jar {
        let jar = store
            .fetch(&standard::MAIN_JAR)?
            .and_then(|set| set.resolved_files().next())
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        Err(Error::config(
            format!("A main class was not specified nor was one found in the jar {jar}"),
            format!("Specify a main class or ensure that the jar {jar} specifies one in the manifest"),
        ))
    } else if has_classpath {
        Err(Error::config(
            "A main class was not specified nor was one found in the supplied classpath",
            "Specify a main class or ensure that the classpath has a jar containing one in the manifest",
        ))
    } else {
        Err(Error::config(
            "A main class was not specified nor was one found in the supplied application resources",
            "Specify a main class or add a jar with a Main-Class manifest attribute to the input",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_manifest_main_section() {
        let text = "Manifest-Version: 1.0\r\nMain-Class: com.example.\r\n Hello\r\nClass-Path: a.jar b.jar\r\n\r\nName: other\r\nMain-Class: Ignored\r\n";
        let attributes = parse_manifest(text);
        assert_eq!(attributes.get("Main-Class").map(String::as_str), Some("com.example.Hello"));
        assert_eq!(attributes.get("Class-Path").map(String::as_str), Some("a.jar b.jar"));
        assert_eq!(attributes.len(), 3);
    }

    #[test]
    fn test_read_manifest_of_non_jar_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plain.jar");
        std::fs::write(&path, b"not a zip").unwrap();
        assert_eq!(read_manifest(&path).unwrap(), None);
    }
}
