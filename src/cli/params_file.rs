//! Seeding the parameter store from the command line and parameter files.
//!
//! Precedence, lowest first: `--params-file`, dedicated flags, `--param`.
//!
//! A parameter file is TOML mapping parameter names to values:
//!
//! ```toml
//! app-name = "Hello"
//! input = "build/libs"
//! main-jar = "hello.jar"
//! win-menu = true
//! license-file = ["LICENSE"]
//!
//! [[file-associations]]
//! extension = "hello"
//! mime-type = "application/x-hello"
//!
//! [[secondary-launcher]]
//! app-name = "HelloCli"
//! main-class = "com.example.Cli"
//! ```

use super::Args;
use crate::bundler::params::{ParamId, ParamStore, parse_properties};
use crate::error::{CliError, Result};
use std::{path::Path, str::FromStr};
use toml::{Table, Value};

/// Builds the seed store for a run.
pub fn seed_store(args: &Args) -> Result<ParamStore> {
    let mut store = ParamStore::new();

    if let Some(file) = &args.params_file {
        load_params_file(&mut store, file)?;
    }

    let flags: [(ParamId, Option<String>); 14] = [
        (ParamId::Input, args.input.as_deref().map(path_string)),
        (ParamId::MainJar, args.main_jar.clone()),
        (ParamId::MainClass, args.main_class.clone()),
        (ParamId::AppName, args.app_name.clone()),
        (ParamId::Version, args.app_version.clone()),
        (ParamId::Vendor, args.vendor.clone()),
        (ParamId::Description, args.description.clone()),
        (ParamId::Copyright, args.copyright.clone()),
        (ParamId::Icon, args.icon.as_deref().map(path_string)),
        (ParamId::LicenseFile, args.license_file.clone()),
        (ParamId::DropInResourcesRoot, args.resource_dir.as_deref().map(path_string)),
        (ParamId::PredefinedRuntimeImage, args.runtime_image.as_deref().map(path_string)),
        (ParamId::PredefinedAppImage, args.app_image.as_deref().map(path_string)),
        (ParamId::InstallDir, args.install_dir.clone()),
    ];
    for (id, value) in flags {
        if let Some(value) = value {
            store.put_raw(id, value);
        }
    }
    if let Some(root) = &args.build_root {
        store.put(ParamId::BuildRoot, root.clone());
    }
    if args.verbose {
        store.put(ParamId::Verbose, true);
    }

    if !args.file_associations.is_empty() {
        let associations = args
            .file_associations
            .iter()
            .map(|file| load_properties(file))
            .collect::<Result<Vec<_>>>()?;
        store.put(ParamId::FileAssociations, associations);
    }

    if !args.secondary_launchers.is_empty() {
        let mut launchers = Vec::new();
        for spec in &args.secondary_launchers {
            let (name, file) = split_assignment("--secondary-launcher", spec)?;
            let mut launcher = load_properties(Path::new(file))?;
            launcher.put_raw(ParamId::AppName, name);
            launchers.push(launcher);
        }
        store.put(ParamId::SecondaryLaunchers, launchers);
    }

    for param in &args.params {
        let (name, value) = split_assignment("--param", param)?;
        store.put_raw(ParamId::from_str(name.trim())?, value);
    }

    log::debug!("Seeded {} parameters", store.ids().count());
    Ok(store)
}

/// Reads a TOML parameter file into `store`.
pub fn load_params_file(store: &mut ParamStore, file: &Path) -> Result<()> {
    let text = std::fs::read_to_string(file).map_err(|e| CliError::UnreadableFile {
        path: file.to_path_buf(),
        reason: e.to_string(),
    })?;
    let table: Table = toml::from_str(&text)?;
    apply_table(store, &table)?;
    log::debug!("Loaded parameters from {}", file.display());
    Ok(())
}

/// Applies one TOML table: strings and numbers stay raw, booleans and arrays
/// are stored typed, arrays of tables become nested stores.
pub fn apply_table(store: &mut ParamStore, table: &Table) -> Result<()> {
    for (key, value) in table {
        let id = ParamId::from_str(key)?;
        match value {
            Value::String(s) => store.put_raw(id, s.clone()),
            Value::Integer(i) => store.put_raw(id, i.to_string()),
            Value::Float(f) => store.put_raw(id, f.to_string()),
            Value::Boolean(b) => store.put(id, *b),
            Value::Datetime(d) => store.put_raw(id, d.to_string()),
            Value::Array(items) if items.iter().all(Value::is_table) => {
                let mut nested = Vec::with_capacity(items.len());
                for item in items {
                    let mut child = ParamStore::new();
                    if let Value::Table(t) = item {
                        apply_table(&mut child, t)?;
                    }
                    nested.push(child);
                }
                store.put(id, nested);
            }
            Value::Array(items) => {
                let list = items
                    .iter()
                    .map(|item| match item {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect::<Vec<_>>();
                store.put(id, list);
            }
            Value::Table(_) => {
                return Err(CliError::InvalidArgument {
                    argument: key.clone(),
                    reason: "nested tables are only allowed as arrays ([[name]])".to_string(),
                }
                .into());
            }
        }
    }
    Ok(())
}

/// Reads a properties file into a nested store. File association files may
/// use the short keys `icon` and `description`.
fn load_properties(file: &Path) -> Result<ParamStore> {
    let text = std::fs::read_to_string(file).map_err(|e| CliError::UnreadableFile {
        path: file.to_path_buf(),
        reason: e.to_string(),
    })?;

    let mut store = ParamStore::new();
    for (key, value) in parse_properties(&text) {
        let id = match key.as_str() {
            "icon" => ParamId::FaIcon,
            "description" => ParamId::FaDescription,
            "name" => ParamId::AppName,
            other => ParamId::from_str(other)?,
        };
        store.put_raw(id, value);
    }
    Ok(store)
}

fn split_assignment<'a>(argument: &str, spec: &'a str) -> Result<(&'a str, &'a str)> {
    spec.split_once('=').ok_or_else(|| {
        CliError::InvalidArgument {
            argument: argument.to_string(),
            reason: format!("expected NAME=VALUE, got '{spec}'"),
        }
        .into()
    })
}

fn path_string(path: &Path) -> String {
    path.display().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundler::params::standard;

    #[test]
    fn test_table_values() {
        let table: Table = toml::from_str(
            r#"
            app-name = "Hello"
            win-menu = true
            license-file = ["LICENSE", "NOTICE"]

            [[file-associations]]
            extension = "hello"
            "#,
        )
        .unwrap();

        let mut store = ParamStore::new();
        apply_table(&mut store, &table).unwrap();
        assert_eq!(store.require(&standard::APP_NAME).unwrap(), "Hello");
        assert!(matches!(
            store.get(ParamId::WinMenuHint),
            Some(crate::bundler::params::ParamValue::Bool(true))
        ));
        assert_eq!(store.require(&standard::LICENSE_FILE).unwrap(), vec!["LICENSE", "NOTICE"]);

        let mut associations = store.require(&standard::FILE_ASSOCIATIONS).unwrap();
        assert_eq!(associations.len(), 1);
        assert_eq!(associations[0].require(&standard::FA_EXTENSIONS).unwrap(), vec!["hello"]);
    }

    #[test]
    fn test_unknown_key_rejected() {
        let table: Table = toml::from_str("no-such-param = 1").unwrap();
        assert!(apply_table(&mut ParamStore::new(), &table).is_err());
    }

    #[test]
    fn test_param_flag_wins() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("package.toml");
        std::fs::write(&file, "app-name = \"FromFile\"\nvendor = \"Acme\"\n").unwrap();

        let args = Args {
            params_file: Some(file),
            app_name: Some("FromFlag".to_string()),
            params: vec!["app-name=FromParam".to_string()],
            ..Args::default()
        };
        let mut store = seed_store(&args).unwrap();
        assert_eq!(store.require(&standard::APP_NAME).unwrap(), "FromParam");
        assert_eq!(store.require(&standard::VENDOR).unwrap(), "Acme");
    }

    #[test]
    fn test_file_association_properties() {
        let dir = tempfile::tempdir().unwrap();
        let props = dir.path().join("fa.properties");
        std::fs::write(&props, "extension=hello\nmime-type=application/x-hello\ndescription=Hello file\n").unwrap();

        let args = Args {
            file_associations: vec![props],
            ..Args::default()
        };
        let mut store = seed_store(&args).unwrap();
        let mut associations = store.require(&standard::FILE_ASSOCIATIONS).unwrap();
        assert_eq!(associations[0].require(&standard::FA_DESCRIPTION).unwrap(), "Hello file");
        assert_eq!(
            associations[0].require(&standard::FA_CONTENT_TYPE).unwrap(),
            vec!["application/x-hello"]
        );
    }
}
