//! End-to-end builds against a recording tool runner.

mod common;

use common::{FakeRunner, Workspace};
use kodegen_bundler_package::bundler::{
    Bundler, PackageType, Platform,
    error::ErrorKind,
    params::{ParamId, ParamValue, standard},
    platform::{self, BuildContext, PipelineState},
};

fn linux_bundler(ws: &Workspace, runner: &std::sync::Arc<FakeRunner>) -> Bundler {
    Bundler::new(&ws.dest)
        .with_platform(Platform::Linux)
        .with_runner(runner.clone())
}

#[tokio::test]
async fn test_app_image_on_linux() {
    let ws = Workspace::new();
    let runner = FakeRunner::new();

    let report = linux_bundler(&ws, &runner)
        .build(PackageType::AppImage, &ws.seed())
        .await;

    let artifact = report.result.as_ref().unwrap();
    let root = ws.dest.join("Hello");
    assert_eq!(artifact.paths, vec![root.clone()]);
    assert_eq!(report.state, PipelineState::CleanedUp);
    assert!(root.join("bin/Hello").is_file());
    assert!(root.join("lib/app/hello.jar").is_file());

    let cfg = std::fs::read_to_string(root.join("lib/app/Hello.cfg")).unwrap();
    assert!(cfg.contains("app.mainjar=hello.jar"));
    assert!(cfg.contains("app.mainclass=com/example/Hello"));
    assert!(runner.calls().is_empty());
}

#[tokio::test]
async fn test_deb_control_file() {
    let ws = Workspace::new();
    let runner = FakeRunner::new();
    let mut seed = ws.seed();
    seed.put(ParamId::Verbose, true);
    seed.put_raw(ParamId::LicenseFile, "LICENSE");
    seed.put_raw(ParamId::LinuxPackageDeps, "default-jre");

    let report = linux_bundler(&ws, &runner).build(PackageType::Deb, &seed).await;

    let artifact = report.result.as_ref().unwrap();
    assert_eq!(artifact.paths, vec![ws.dest.join("hello_1.0_amd64.deb")]);
    assert_eq!(artifact.checksum.len(), 64);

    let working = report.retained_image.clone().unwrap();
    assert_eq!(working, ws.build_root.join("linux/deb.image"));
    let debian = working.join("hello/DEBIAN");
    let control = std::fs::read_to_string(debian.join("control")).unwrap();
    assert!(control.contains("Package: hello\n"));
    assert!(control.contains("Version: 1.0\n"));
    assert!(control.contains("Maintainer: Acme"));
    assert!(control.contains("Depends: default-jre"));
    assert!(!control.contains("APPLICATION_"));
    assert!(debian.join("copyright").is_file());
    assert!(working.join("hello/opt/hello/bin/Hello").is_file());

    let build = runner.call_with("dpkg-deb", "--build").unwrap();
    assert_eq!(build.args.last().map(String::as_str), Some(ws.dest.to_str().unwrap()));
    assert!(runner.call_with("dpkg-deb", "--version").unwrap().probe_only);
}

#[tokio::test]
async fn test_rpm_spec_file() {
    let ws = Workspace::new();
    let runner = FakeRunner::new();
    let mut seed = ws.seed();
    seed.put(ParamId::Verbose, true);

    let report = linux_bundler(&ws, &runner).build(PackageType::Rpm, &seed).await;

    let artifact = report.result.as_ref().unwrap();
    assert_eq!(artifact.paths, vec![ws.dest.join("hello-1.0-1.x86_64.rpm")]);

    let working = ws.build_root.join("linux/rpm.image");
    let spec = std::fs::read_to_string(working.join("hello.spec")).unwrap();
    assert!(spec.contains("hello"));
    assert!(spec.contains("1.0"));
    assert!(!spec.contains("APPLICATION_"));
    assert!(working.join("opt/hello/lib/app/hello.jar").is_file());

    let build = runner.call_with("rpmbuild", "-bb").unwrap();
    let rpmdir = format!("%_rpmdir {}", ws.dest.display());
    assert!(build.args.contains(&rpmdir));
}

#[tokio::test]
async fn test_tool_failure_is_packaging_error() {
    let ws = Workspace::new();
    let runner = FakeRunner::new();
    runner.fail("dpkg-deb", "--build", 3, "dpkg-deb: error: parsing file 'control'");

    let report = linux_bundler(&ws, &runner).build(PackageType::Deb, &ws.seed()).await;

    assert_eq!(report.state, PipelineState::Failed);
    let err = report.result.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Packaging);
    assert_eq!(err.exit_code(), Some(3));
    assert!(err.tool_output().unwrap().contains("parsing file 'control'"));

    assert!(report.retained_image.is_none());
    assert!(!ws.build_root.join("linux/deb.image").exists());
}

#[tokio::test]
async fn test_tool_failure_keeps_image_when_verbose() {
    let ws = Workspace::new();
    let runner = FakeRunner::new();
    runner.fail("dpkg-deb", "--build", 3, "dpkg-deb: error");
    let mut seed = ws.seed();
    seed.put(ParamId::Verbose, true);

    let report = linux_bundler(&ws, &runner).build(PackageType::Deb, &seed).await;

    assert!(report.result.is_err());
    let kept = report.retained_image.unwrap();
    assert!(kept.join("hello/DEBIAN/control").is_file());
}

#[tokio::test]
async fn test_long_copyright_fails_before_any_tool() {
    let ws = Workspace::new();
    let runner = FakeRunner::new();
    let mut seed = ws.seed();
    seed.put_raw(ParamId::Copyright, "c".repeat(101));

    let report = linux_bundler(&ws, &runner).build(PackageType::Deb, &seed).await;

    let err = report.result.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert!(err.to_string().contains("copyright"));
    assert!(runner.calls().is_empty());
    assert!(!ws.build_root.exists());
    assert!(!ws.dest.exists());
}

#[tokio::test]
async fn test_missing_predefined_image() {
    let ws = Workspace::new();
    let runner = FakeRunner::new();
    let mut seed = ws.seed();
    seed.put_raw(
        ParamId::PredefinedAppImage,
        ws.dir.path().join("missing").display().to_string(),
    );

    let report = linux_bundler(&ws, &runner).build(PackageType::Deb, &seed).await;

    let err = report.result.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert!(err.to_string().contains("does not exist"));
    assert!(!ws.build_root.exists());
}

#[tokio::test]
async fn test_predefined_image_leaves_no_temporary_files() {
    let ws = Workspace::new();
    let runner = FakeRunner::new();
    let image = linux_bundler(&ws, &runner)
        .build(PackageType::AppImage, &ws.seed())
        .await;
    let built = image.result.unwrap().paths[0].clone();
    let images = ws.dir.path().join("images");
    std::fs::create_dir_all(&images).unwrap();
    let predefined = images.join("Hello");
    std::fs::rename(&built, &predefined).unwrap();

    let mut seed = ws.seed();
    seed.remove(ParamId::BuildRoot);
    seed.put_raw(ParamId::PredefinedAppImage, predefined.display().to_string());

    let report = linux_bundler(&ws, &runner).build(PackageType::Deb, &seed).await;

    assert!(report.is_success());
    assert!(report.retained_image.is_none());
    let build_root = report.params.peek(&standard::BUILD_ROOT).unwrap();
    assert!(
        build_root
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("kodegen-package-")
    );
    assert!(!build_root.exists());
    assert!(!report.params.peek(&standard::WORKING_IMAGE_DIR).unwrap().exists());
    assert!(predefined.join("bin/Hello").is_file());
    assert!(predefined.join("lib/app/hello.jar").is_file());
}

#[tokio::test]
async fn test_cleanup_failure_keeps_artifact() {
    let ws = Workspace::new();
    let runner = FakeRunner::new();
    let working = ws.build_root.join("linux/deb.image");
    runner.clobber("dpkg-deb", &working);

    let report = linux_bundler(&ws, &runner).build(PackageType::Deb, &ws.seed()).await;

    let artifact = report.result.as_ref().unwrap();
    assert_eq!(artifact.paths, vec![ws.dest.join("hello_1.0_amd64.deb")]);
    assert_eq!(report.state, PipelineState::CleanedUp);
    assert!(report.retained_image.is_none());
    assert!(working.is_file());
}

#[tokio::test]
async fn test_batch_runs_image_first() {
    let ws = Workspace::new();
    let runner = FakeRunner::new();

    let reports = linux_bundler(&ws, &runner)
        .build_all(&[PackageType::Deb, PackageType::AppImage], &ws.seed())
        .await;

    let order = reports.iter().map(|r| r.package_type).collect::<Vec<_>>();
    assert_eq!(order, vec![PackageType::AppImage, PackageType::Deb]);
    assert!(reports.iter().all(|r| r.is_success()));
}

#[tokio::test]
async fn test_validate_creates_no_files() {
    let ws = Workspace::new();
    let runner = FakeRunner::new();
    let ctx = BuildContext::new(Platform::Linux, runner.clone());

    for package_type in [PackageType::AppImage, PackageType::Deb, PackageType::Rpm] {
        let mut store = ws.seed();
        platform::bundler_for(package_type)
            .unwrap()
            .validate(&ctx, &mut store)
            .await
            .unwrap();
    }

    assert!(!ws.build_root.exists());
    assert!(!ws.dest.exists());
}

#[tokio::test]
async fn test_windows_exe_forces_menu_entry() {
    let ws = Workspace::new();
    let runner = FakeRunner::new();
    let mut seed = ws.seed();
    seed.put_raw(ParamId::WinInnoSetupCompiler, "iscc");

    let report = Bundler::new(&ws.dest)
        .with_platform(Platform::Windows)
        .with_runner(runner.clone())
        .build(PackageType::WinExe, &seed)
        .await;

    let artifact = report.result.as_ref().unwrap();
    assert_eq!(artifact.paths, vec![ws.dest.join("Hello-1.0.exe")]);
    assert_eq!(report.params.get(ParamId::WinMenuHint), Some(&ParamValue::Bool(true)));
    assert!(runner.call_with("iscc", "/?").unwrap().probe_only);
    assert!(runner.call_with("iscc", "/q").is_some());
    assert!(!ws.build_root.join("windows/win-exe.image").exists());
}

#[tokio::test]
async fn test_windows_msi() {
    let ws = Workspace::new();
    let runner = FakeRunner::new();
    let mut seed = ws.seed();
    seed.put_raw(ParamId::WinWixCandle, "candle");
    seed.put_raw(ParamId::WinWixLight, "light");

    let report = Bundler::new(&ws.dest)
        .with_platform(Platform::Windows)
        .with_runner(runner.clone())
        .build(PackageType::WinMsi, &seed)
        .await;

    let artifact = report.result.as_ref().unwrap();
    assert_eq!(artifact.paths, vec![ws.dest.join("Hello-1.0.msi")]);
    assert_eq!(
        runner.programs().iter().filter(|p| p.as_str() == "candle" || p.as_str() == "light").count(),
        4
    );
}

#[tokio::test]
async fn test_mac_pkg() {
    let ws = Workspace::new();
    let runner = FakeRunner::new();

    let report = Bundler::new(&ws.dest)
        .with_platform(Platform::MacOs)
        .with_runner(runner.clone())
        .build(PackageType::MacPkg, &ws.seed())
        .await;

    let artifact = report.result.as_ref().unwrap();
    assert_eq!(artifact.paths, vec![ws.dest.join("Hello-1.0.pkg")]);
    assert_eq!(runner.programs(), vec!["pkgbuild", "productbuild"]);
    assert!(runner.call_with("productbuild", "--sign").is_none());
}

#[tokio::test]
async fn test_mac_app_store_pkg() {
    let ws = Workspace::new();
    let runner = FakeRunner::new();
    let mut seed = ws.seed();
    seed.put_raw(ParamId::MacAppStoreAppKey, "3rd Party Mac Developer Application: Acme");
    seed.put_raw(ParamId::MacAppStorePkgKey, "3rd Party Mac Developer Installer: Acme");
    seed.put_raw(ParamId::MacDeveloperIdAppKey, "Developer ID Application: Acme");

    let report = Bundler::new(&ws.dest)
        .with_platform(Platform::MacOs)
        .with_runner(runner.clone())
        .build(PackageType::MacAppStore, &seed)
        .await;

    let artifact = report.result.as_ref().unwrap();
    assert_eq!(artifact.paths, vec![ws.dest.join("Hello-1.0-MacAppStore.pkg")]);
    assert!(runner.programs().iter().any(|p| p == "codesign"));
    assert!(
        runner
            .calls()
            .iter()
            .flat_map(|c| c.args.iter())
            .all(|a| !a.starts_with("Developer ID"))
    );
    assert!(runner.call_with("productbuild", "--component").is_some());
}

#[tokio::test]
async fn test_failed_build_does_not_stop_batch() {
    let ws = Workspace::new();
    let runner = FakeRunner::new();
    runner.fail("dpkg-deb", "--build", 2, "no space left on device");
    let seed = ws.seed();

    let reports = linux_bundler(&ws, &runner)
        .build_all(&[PackageType::Deb, PackageType::Rpm], &seed)
        .await;

    assert_eq!(reports.len(), 2);
    assert!(!reports[0].is_success());
    assert!(reports[1].is_success());
    assert_eq!(
        reports[1].params.peek(&standard::WORKING_IMAGE_DIR),
        Some(ws.build_root.join("linux/rpm.image"))
    );
    assert!(!seed.contains(ParamId::WorkingImageDir));
}

#[tokio::test]
async fn test_unsupported_platform() {
    let ws = Workspace::new();
    let runner = FakeRunner::new();

    let report = Bundler::new(&ws.dest)
        .with_platform(Platform::MacOs)
        .with_runner(runner.clone())
        .build(PackageType::Deb, &ws.seed())
        .await;

    let err = report.result.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedPlatform);
    assert!(runner.calls().is_empty());
}
