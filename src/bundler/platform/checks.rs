//! Validation shared by the installer bundlers.

use crate::bundler::{
    error::{Error, Result},
    params::{Param, ParamStore, manifest, standard},
};
use std::path::Path;

/// Longest copyright notice installers accept.
pub const MAX_COPYRIGHT_LEN: usize = 100;

/// Longest application identifier; longer ones are truncated.
pub const MAX_IDENTIFIER_LEN: usize = 126;

/// Values that end up inside single-line installer fields.
const SINGLE_LINE: &[Param<String>] = &[
    standard::APP_NAME,
    standard::COPYRIGHT,
    standard::DESCRIPTION,
    standard::TITLE,
    standard::VENDOR,
    standard::VERSION,
];

/// Checks every installer bundler runs before touching the disk.
pub fn installer_preconditions(store: &mut ParamStore) -> Result<()> {
    single_line(store, SINGLE_LINE)?;
    copyright_length(store)?;
    store.require(&standard::APP_NAME)?;
    manifest::validate_launch_info(store)?;
    truncate_identifier(store)?;
    licenses_in_resources(store)?;
    single_content_type(store)?;
    Ok(())
}

/// Rejects values containing line breaks.
pub fn single_line(store: &mut ParamStore, params: &[Param<String>]) -> Result<()> {
    for param in params {
        if let Some(value) = store.fetch(param)?
            && value.contains(['\n', '\r'])
        {
            return Err(Error::config(
                format!("parameter '{}' must not contain a newline", param.id()),
                format!("Remove the line break from --{}", param.id()),
            ));
        }
    }
    Ok(())
}

/// Rejects copyright notices over [`MAX_COPYRIGHT_LEN`] characters.
pub fn copyright_length(store: &mut ParamStore) -> Result<()> {
    let Some(copyright) = store.fetch(&standard::COPYRIGHT)? else {
        return Ok(());
    };
    let len = copyright.chars().count();
    if len > MAX_COPYRIGHT_LEN {
        return Err(Error::config(
            format!(
                "error.copyright-is-too-long: copyright is {len} characters, the limit is {MAX_COPYRIGHT_LEN}"
            ),
            format!("Shorten --copyright to at most {MAX_COPYRIGHT_LEN} characters"),
        ));
    }
    Ok(())
}

/// Truncates the identifier to [`MAX_IDENTIFIER_LEN`] characters.
pub fn truncate_identifier(store: &mut ParamStore) -> Result<()> {
    let Some(identifier) = store.fetch(&standard::IDENTIFIER)? else {
        return Ok(());
    };
    if identifier.chars().count() > MAX_IDENTIFIER_LEN {
        let truncated: String = identifier.chars().take(MAX_IDENTIFIER_LEN).collect();
        log::info!(
            "Identifier {} truncated to {} characters: {}",
            identifier,
            MAX_IDENTIFIER_LEN,
            truncated
        );
        store.put(standard::IDENTIFIER.id(), truncated);
    }
    Ok(())
}

/// Every license file must be shipped with the application resources.
pub fn licenses_in_resources(store: &mut ParamStore) -> Result<()> {
    let licenses = store.fetch(&standard::LICENSE_FILE)?.unwrap_or_default();
    if licenses.is_empty() {
        return Ok(());
    }
    let resources = store.fetch(&standard::APP_RESOURCES_LIST)?.unwrap_or_default();
    for license in &licenses {
        let found = resources.iter().any(|set| set.contains(Path::new(license)));
        if !found {
            return Err(Error::config(
                format!("license file {license} is not part of the application resources"),
                "Place the license file in the input directory and pass its relative path",
            ));
        }
    }
    Ok(())
}

/// Installers register at most one content type per file association.
pub fn single_content_type(store: &mut ParamStore) -> Result<()> {
    let associations = store.fetch(&standard::FILE_ASSOCIATIONS)?.unwrap_or_default();
    for mut association in associations {
        let types = association.fetch(&standard::FA_CONTENT_TYPE)?.unwrap_or_default();
        if types.len() > 1 {
            return Err(Error::config(
                format!(
                    "file association declares {} content types ({}), only one is supported",
                    types.len(),
                    types.join(", ")
                ),
                "Keep a single mime-type per file association",
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundler::{error::ErrorKind, params::ParamId};

    #[test]
    fn test_copyright_limit() {
        let mut store = ParamStore::new();
        store.put(ParamId::Copyright, "c".repeat(100));
        assert!(copyright_length(&mut store).is_ok());

        store.put(ParamId::Copyright, "c".repeat(101));
        let err = copyright_length(&mut store).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(err.to_string().contains("copyright-is-too-long"));
    }

    #[test]
    fn test_newline_rejected() {
        let mut store = ParamStore::new();
        store.put(ParamId::Vendor, "Acme\nCorp");
        let err = single_line(&mut store, SINGLE_LINE).unwrap_err();
        assert!(err.to_string().contains("vendor"));
    }

    #[test]
    fn test_identifier_truncated() {
        let mut store = ParamStore::new();
        store.put(ParamId::Identifier, "a".repeat(130));
        truncate_identifier(&mut store).unwrap();
        assert_eq!(store.peek(&standard::IDENTIFIER).unwrap().len(), MAX_IDENTIFIER_LEN);
    }

    #[test]
    fn test_two_content_types_rejected() {
        let mut association = ParamStore::new();
        association.put_raw(ParamId::FaContentType, "text/plain text/x-log");
        let mut store = ParamStore::new();
        store.put(ParamId::FileAssociations, vec![association]);
        assert!(single_content_type(&mut store).is_err());
    }

    #[test]
    fn test_license_outside_resources_rejected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("app.jar"), b"jar").unwrap();
        let mut store = ParamStore::new();
        store.put_raw(ParamId::Input, dir.path().display().to_string());
        store.put_raw(ParamId::LicenseFile, "LICENSE.txt");
        assert!(licenses_in_resources(&mut store).is_err());

        std::fs::write(dir.path().join("LICENSE.txt"), b"MIT").unwrap();
        let mut store = ParamStore::new();
        store.put_raw(ParamId::Input, dir.path().display().to_string());
        store.put_raw(ParamId::LicenseFile, "LICENSE.txt");
        assert!(licenses_in_resources(&mut store).is_ok());
    }
}
