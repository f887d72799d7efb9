//! Code signing of `.app` images with `codesign`.
//!
//! Inner components (native libraries, executables in the runtime, nested
//! frameworks) are signed first, the bundle itself last, so each signature
//! covers already signed content.

use super::{BUNDLE_SIGNING_PREFIX, SIGNING_KEYCHAIN};
use crate::bundler::{
    error::Result,
    params::ParamStore,
    platform::BuildContext,
    utils::process::ToolCommand,
};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Entitlements for the bundle and for inner components.
#[derive(Clone, Copy, Debug)]
pub struct Entitlements<'a> {
    /// Applied to the bundle itself.
    pub app: &'a Path,
    /// Applied to everything inside it.
    pub inherit: &'a Path,
}

/// Builds one `codesign` invocation.
pub fn codesign_command(
    key: &str,
    prefix: Option<&str>,
    keychain: Option<&Path>,
    entitlements: Option<&Path>,
    target: &Path,
) -> ToolCommand {
    let mut cmd = ToolCommand::new("codesign")
        .arg("--timestamp")
        .arg("--options")
        .arg("runtime")
        .arg("--force")
        .arg("-s")
        .arg(key);
    if let Some(prefix) = prefix {
        cmd = cmd.arg("--prefix").arg(prefix);
    }
    if let Some(keychain) = keychain {
        cmd = cmd.arg("--keychain").arg(keychain);
    }
    if let Some(entitlements) = entitlements {
        cmd = cmd.arg("--entitlements").arg(entitlements);
    }
    cmd.arg("-vvvv").arg(target)
}

/// Components inside `app` that need their own signature: frameworks, and
/// native libraries or executables outside `Contents/MacOS`.
pub fn inner_components(app: &Path) -> Result<Vec<PathBuf>> {
    let launchers = app.join("Contents/MacOS");
    let mut components = Vec::new();

    let mut walker = WalkDir::new(app.join("Contents")).into_iter();
    while let Some(entry) = walker.next() {
        let entry = entry?;
        let path = entry.path();

        if entry.file_type().is_dir() {
            if path.extension().is_some_and(|ext| ext == "framework") {
                components.push(path.to_path_buf());
                walker.skip_current_dir();
            }
            continue;
        }
        if !entry.file_type().is_file() || path.starts_with(&launchers) {
            continue;
        }

        let native = path
            .extension()
            .is_some_and(|ext| ext == "dylib" || ext == "jnilib");
        if native || is_executable(&entry)? {
            components.push(path.to_path_buf());
        }
    }
    Ok(components)
}

#[cfg(unix)]
fn is_executable(entry: &walkdir::DirEntry) -> Result<bool> {
    use std::os::unix::fs::PermissionsExt;
    Ok(entry.metadata()?.permissions().mode() & 0o111 != 0)
}

#[cfg(not(unix))]
fn is_executable(_: &walkdir::DirEntry) -> Result<bool> {
    Ok(false)
}

/// Signs every inner component of `app`, then the bundle.
pub async fn sign_app_image(
    ctx: &BuildContext,
    store: &mut ParamStore,
    app: &Path,
    key: &str,
    entitlements: Option<Entitlements<'_>>,
) -> Result<()> {
    let prefix = store.fetch(&BUNDLE_SIGNING_PREFIX)?;
    let keychain = store.fetch(&SIGNING_KEYCHAIN)?;
    log::info!("Signing {} with '{}'", app.display(), key);

    for component in inner_components(app)? {
        ctx.exec(codesign_command(
            key,
            prefix.as_deref(),
            keychain.as_deref(),
            entitlements.map(|e| e.inherit),
            &component,
        ))
        .await?;
    }

    ctx.exec(codesign_command(
        key,
        None,
        keychain.as_deref(),
        entitlements.map(|e| e.app),
        app,
    ))
    .await?;

    log::info!("✓ Signed {}", app.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codesign_arguments() {
        let cmd = codesign_command(
            "Developer ID Application: Jane",
            Some("com.example."),
            Some(Path::new("/tmp/login.keychain")),
            None,
            Path::new("Hello.app"),
        );
        assert_eq!(cmd.program, "codesign");
        assert_eq!(
            cmd.args,
            vec![
                "--timestamp",
                "--options",
                "runtime",
                "--force",
                "-s",
                "Developer ID Application: Jane",
                "--prefix",
                "com.example.",
                "--keychain",
                "/tmp/login.keychain",
                "-vvvv",
                "Hello.app",
            ]
        );
    }

    #[test]
    fn test_inner_components_skip_launchers() {
        let dir = tempfile::tempdir().unwrap();
        let app = dir.path().join("Hello.app");
        std::fs::create_dir_all(app.join("Contents/MacOS")).unwrap();
        std::fs::create_dir_all(app.join("Contents/runtime/lib")).unwrap();
        std::fs::create_dir_all(app.join("Contents/Frameworks/Foo.framework/Versions")).unwrap();
        std::fs::write(app.join("Contents/MacOS/Hello"), b"launcher").unwrap();
        std::fs::write(app.join("Contents/runtime/lib/libjava.dylib"), b"lib").unwrap();
        std::fs::write(app.join("Contents/Frameworks/Foo.framework/Versions/Foo"), b"fw").unwrap();
        std::fs::write(app.join("Contents/Info.plist"), b"plist").unwrap();

        let components = inner_components(&app).unwrap();
        assert!(components.contains(&app.join("Contents/runtime/lib/libjava.dylib")));
        assert!(components.contains(&app.join("Contents/Frameworks/Foo.framework")));
        assert!(!components.iter().any(|c| c.starts_with(app.join("Contents/MacOS"))));
        assert!(!components.contains(&app.join("Contents/Info.plist")));
    }
}
