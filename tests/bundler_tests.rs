#[cfg(test)]
mod tests {
    use kodegen_bundler_package::bundler::{
        PackageType, Platform,
        platform::{self, PlatformBundler},
    };
    use std::str::FromStr;

    #[test]
    fn test_package_type_priority() {
        assert_eq!(PackageType::AppImage.priority(), 0);
        assert!(PackageType::AppImage.priority() < PackageType::Deb.priority());
        assert!(PackageType::MacPkg.priority() < PackageType::MacAppStore.priority());
    }

    #[test]
    fn test_package_type_short_names() {
        assert_eq!(PackageType::Deb.short_name(), "deb");
        assert_eq!(PackageType::AppImage.short_name(), "app-image");
        assert_eq!(PackageType::WinExe.short_name(), "exe");
        assert_eq!(PackageType::from_str("MSI").unwrap(), PackageType::WinMsi);
        assert_eq!(PackageType::from_str("image").unwrap(), PackageType::AppImage);
        assert!(PackageType::from_str("dmg").is_err());
    }

    #[test]
    fn test_current_platform_types() {
        let types = PackageType::all_for_current_platform();
        assert_eq!(types.first(), Some(&PackageType::AppImage));

        #[cfg(target_os = "linux")]
        assert!(types.contains(&PackageType::Deb));

        #[cfg(target_os = "macos")]
        assert!(types.contains(&PackageType::MacPkg));

        #[cfg(target_os = "windows")]
        assert!(types.contains(&PackageType::WinMsi));

        assert!(!types.contains(&PackageType::MacAppStore));
    }

    #[test]
    fn test_registry_covers_every_type() {
        for package_type in PackageType::ALL {
            let bundler = platform::bundler_for(*package_type).unwrap();
            assert_eq!(bundler.package_type(), *package_type);
            assert_eq!(bundler.id(), package_type.short_name());
            assert!(!bundler.parameters().is_empty());
        }
        assert_eq!(platform::registry().len(), PackageType::ALL.len());
    }

    #[test]
    fn test_supported_platforms() {
        let deb: &dyn PlatformBundler = platform::bundler_for(PackageType::Deb).unwrap();
        assert!(deb.supported(Platform::Linux));
        assert!(!deb.supported(Platform::Windows));

        let image = platform::bundler_for(PackageType::AppImage).unwrap();
        for p in [Platform::Linux, Platform::MacOs, Platform::Windows] {
            assert!(image.supported(p));
        }
    }
}
