//! Overridable resources and text templates.
//!
//! Every file a bundler feeds to a native tool (launcher scripts, Inno Setup
//! and WiX projects, Debian control files, entitlements) can be replaced by
//! the user. A [`ResourceRequest`] names the resource and the places to look;
//! [`resolve`] walks them in this order:
//!
//! 1. `<drop-in root>/<public name>`
//! 2. a bundled resource called `<public name>`
//! 3. the explicit override file
//! 4. the bundled default
//!
//! Templates use bare upper-case placeholders (`APPLICATION_NAME`) that
//! [`render`] replaces literally.

use crate::bundler::{
    error::{Error, ErrorExt, Result},
    params::{ParamStore, standard},
};
use std::{
    collections::BTreeMap,
    fmt,
    path::{Path, PathBuf},
};

/// Placeholder → value pairs. `None` values leave the placeholder verbatim.
pub type Substitutions = BTreeMap<&'static str, Option<String>>;

const BUNDLED: &[(&str, &str)] = &[
    ("launcher.sh", include_str!("templates/launcher.sh")),
    ("launcher.cmd", include_str!("templates/launcher.cmd")),
    ("template.iss", include_str!("templates/template.iss")),
    ("template.wxs", include_str!("templates/template.wxs")),
    ("template.control", include_str!("templates/template.control")),
    ("template.postinst", include_str!("templates/template.postinst")),
    ("template.prerm", include_str!("templates/template.prerm")),
    ("template.desktop", include_str!("templates/template.desktop")),
    ("template.spec", include_str!("templates/template.spec")),
    ("MacAppStore.entitlements", include_str!("templates/MacAppStore.entitlements")),
    (
        "MacAppStore_Inherit.entitlements",
        include_str!("templates/MacAppStore_Inherit.entitlements"),
    ),
];

/// Looks up a resource compiled into the binary.
pub fn bundled(name: &str) -> Option<&'static str> {
    BUNDLED
        .iter()
        .find(|(bundled_name, _)| *bundled_name == name)
        .map(|(_, content)| *content)
}

/// Where a resolved resource came from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResourceSource {
    /// File in the drop-in resource directory.
    DropIn(PathBuf),
    /// Bundled resource matching the public name.
    Bundled,
    /// Explicit override file.
    Custom(PathBuf),
    /// Bundled default.
    Default,
}

impl fmt::Display for ResourceSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceSource::DropIn(path) => write!(f, "drop-in {}", path.display()),
            ResourceSource::Bundled => f.write_str("bundled"),
            ResourceSource::Custom(path) => write!(f, "custom {}", path.display()),
            ResourceSource::Default => f.write_str("default"),
        }
    }
}

/// A request for one overridable resource.
#[derive(Clone, Debug, Default)]
pub struct ResourceRequest {
    public_name: Option<String>,
    category: String,
    default_name: Option<String>,
    override_file: Option<PathBuf>,
    drop_in_root: Option<PathBuf>,
}

impl ResourceRequest {
    /// Starts a request; `category` labels the resource in log output.
    pub fn new(category: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            ..Default::default()
        }
    }

    /// Starts a request whose drop-in root is the store's resource directory.
    pub fn for_store(category: impl Into<String>, store: &mut ParamStore) -> Result<Self> {
        let root = store.fetch(&standard::DROP_IN_RESOURCES_ROOT)?;
        Ok(Self {
            drop_in_root: root,
            ..Self::new(category)
        })
    }

    /// Name users drop into the resource directory to override this resource.
    pub fn public_name(mut self, name: impl Into<String>) -> Self {
        self.public_name = Some(name.into());
        self
    }

    /// Bundled fallback.
    pub fn default_name(mut self, name: impl Into<String>) -> Self {
        self.default_name = Some(name.into());
        self
    }

    /// Explicit override file, consulted after the drop-in and bundled
    /// public lookups.
    pub fn override_file(mut self, path: Option<PathBuf>) -> Self {
        self.override_file = path;
        self
    }

    /// Directory searched first.
    pub fn drop_in_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.drop_in_root = Some(root.into());
        self
    }

    /// Category label.
    pub fn category(&self) -> &str {
        &self.category
    }

    fn display_name(&self) -> String {
        self.public_name
            .clone()
            .or_else(|| self.default_name.clone())
            .unwrap_or_default()
    }
}

/// Bytes of a resolved resource and their origin.
#[derive(Clone, Debug)]
pub struct ResolvedResource {
    /// Resource content.
    pub bytes: Vec<u8>,
    /// Resolution branch that produced it.
    pub source: ResourceSource,
}

impl ResolvedResource {
    /// Whether the content came from a bundled template rather than a user file.
    pub fn is_template(&self) -> bool {
        matches!(self.source, ResourceSource::Bundled | ResourceSource::Default)
    }

    /// Content as text.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}

/// Resolves a resource; the first branch that produces content wins.
pub async fn resolve(request: &ResourceRequest) -> Result<ResolvedResource> {
    let category = &request.category;

    if let Some(public) = &request.public_name {
        if let Some(root) = &request.drop_in_root {
            let candidate = root.join(public);
            if candidate.is_file() {
                let bytes = tokio::fs::read(&candidate)
                    .await
                    .fs_context("reading drop-in resource", &candidate)?;
                log::info!(
                    "Using custom package resource [{}] (loaded from {})",
                    category,
                    candidate.display()
                );
                return Ok(ResolvedResource {
                    bytes,
                    source: ResourceSource::DropIn(candidate),
                });
            }
        }

        if let Some(content) = bundled(public) {
            log::debug!("Using bundled resource [{}] {}", category, public);
            return Ok(ResolvedResource {
                bytes: content.as_bytes().to_vec(),
                source: ResourceSource::Bundled,
            });
        }
    }

    if let Some(custom) = &request.override_file {
        let bytes = tokio::fs::read(custom)
            .await
            .fs_context("reading custom resource", custom)?;
        log::info!(
            "Using custom package resource [{}] (loaded from file {})",
            category,
            custom.display()
        );
        return Ok(ResolvedResource {
            bytes,
            source: ResourceSource::Custom(custom.clone()),
        });
    }

    if let Some(default) = &request.default_name
        && let Some(content) = bundled(default)
    {
        log::debug!(
            "Using default package resource {} [{}] (add {} to the resource directory to customize)",
            default,
            category,
            request.public_name.as_deref().unwrap_or(default)
        );
        return Ok(ResolvedResource {
            bytes: content.as_bytes().to_vec(),
            source: ResourceSource::Default,
        });
    }

    Err(Error::ResourceMissing {
        name: request.display_name(),
        category: category.clone(),
    })
}

/// Replaces every placeholder whose value is `Some`. Longer placeholders are
/// replaced first so one never clobbers another it contains.
pub fn render(text: &str, substitutions: &Substitutions) -> String {
    let mut keys: Vec<_> = substitutions
        .iter()
        .filter_map(|(key, value)| value.as_ref().map(|v| (*key, v)))
        .collect();
    keys.sort_by_key(|(key, _)| std::cmp::Reverse(key.len()));

    let mut result = text.to_string();
    for (key, value) in keys {
        result = result.replace(key, value);
    }
    result
}

/// Resolves and renders a text resource.
pub async fn render_resource(
    request: &ResourceRequest,
    substitutions: &Substitutions,
) -> Result<String> {
    let resolved = resolve(request).await?;
    Ok(render(&resolved.text(), substitutions))
}

/// Resolves a resource and writes it to `dest` unchanged.
pub async fn fetch_to(request: &ResourceRequest, dest: &Path) -> Result<ResourceSource> {
    let resolved = resolve(request).await?;
    write_resource(dest, &resolved.bytes).await?;
    Ok(resolved.source)
}

/// Resolves, renders and writes a text resource.
pub async fn render_to(
    request: &ResourceRequest,
    substitutions: &Substitutions,
    dest: &Path,
) -> Result<()> {
    let text = render_resource(request, substitutions).await?;
    write_resource(dest, text.as_bytes()).await
}

async fn write_resource(dest: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .fs_context("creating resource directory", parent)?;
    }
    tokio::fs::write(dest, bytes)
        .await
        .fs_context("writing resource", dest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_skips_absent_values() {
        let mut subs = Substitutions::new();
        subs.insert("APPLICATION_NAME", Some("Hello".into()));
        subs.insert("APPLICATION_VENDOR", None);

        let rendered = render("APPLICATION_NAME by APPLICATION_VENDOR (UNKNOWN_KEY)", &subs);
        assert_eq!(rendered, "Hello by APPLICATION_VENDOR (UNKNOWN_KEY)");
    }

    #[test]
    fn test_every_template_is_bundled() {
        for name in [
            "launcher.sh",
            "launcher.cmd",
            "template.iss",
            "template.wxs",
            "template.control",
            "template.postinst",
            "template.prerm",
            "template.desktop",
            "template.spec",
            "MacAppStore.entitlements",
            "MacAppStore_Inherit.entitlements",
        ] {
            assert!(bundled(name).is_some(), "{name} missing");
        }
        assert!(bundled("nope.txt").is_none());
    }
}
