use std::path::{Component, Path, PathBuf};

/// The managed site's file tree. Caller-supplied paths never leave `root`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteFiles {
    root: PathBuf,
    content_dir: PathBuf,
    endpoint_file: String,
}

impl SiteFiles {
    pub fn new(root: impl Into<PathBuf>, content_dir: impl Into<PathBuf>, endpoint_file: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            content_dir: content_dir.into(),
            endpoint_file: endpoint_file.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Content directory relative to the root.
    pub fn content_dir(&self) -> &Path {
        &self.content_dir
    }

    /// File name excluded from listings that skip the endpoint itself.
    pub fn endpoint_file(&self) -> &str {
        &self.endpoint_file
    }

    /// `root/relative`, or `None` for absolute paths and `..` components.
    pub fn resolve(&self, relative: &str) -> Option<PathBuf> {
        let rel = Path::new(relative);
        let confined = rel
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        confined.then(|| self.root.join(rel))
    }

    pub fn plugins_dir(&self) -> PathBuf {
        self.root.join(&self.content_dir).join("plugins")
    }

    pub fn themes_dir(&self) -> PathBuf {
        self.root.join(&self.content_dir).join("themes")
    }

    /// `<plugins>/<name>` for a single directory name.
    pub fn plugin_dir(&self, name: &str) -> Option<PathBuf> {
        single_component(name).then(|| self.plugins_dir().join(name))
    }

    pub fn theme_dir(&self, name: &str) -> Option<PathBuf> {
        single_component(name).then(|| self.themes_dir().join(name))
    }

    /// Marker file present while the application is being upgraded.
    pub fn maintenance_file(&self) -> PathBuf {
        self.root.join(".maintenance")
    }

    /// Application version: first line of `<root>/VERSION`.
    pub fn app_version(&self) -> Option<String> {
        let text = std::fs::read_to_string(self.root.join("VERSION")).ok()?;
        let line = text.lines().next()?.trim();
        (!line.is_empty()).then(|| line.to_string())
    }
}

fn single_component(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(components.next(), Some(Component::Normal(_))) && components.next().is_none()
}
