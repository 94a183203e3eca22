//! Local static-file storage
//!
//! References of the form `/static/<subpath>` (or absolute URLs whose path is
//! `/static/<subpath>`) map to `<root>/<subpath>`. Anything that would resolve
//! outside the root is rejected.

use std::path::{Component, Path, PathBuf};

use crate::error::{ImageGenError, Result};

/// URL path prefix under which the static root is served.
pub const STATIC_URL_PREFIX: &str = "/static/";
/// Directory under the static root holding generated and cached images.
pub const IMAGES_SUBDIR: &str = "images";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticRoot {
    root: PathBuf,
}

impl StaticRoot {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn images_dir(&self) -> PathBuf {
        self.root.join(IMAGES_SUBDIR)
    }

    /// Whether `reference` names a file under the static prefix.
    pub fn is_local_reference(reference: &str) -> bool {
        Self::static_subpath(reference).is_some()
    }

    /// The part after `/static/` for local references, percent-decoded when
    /// taken from a URL.
    pub fn static_subpath(reference: &str) -> Option<String> {
        if let Some(rest) = reference.strip_prefix(STATIC_URL_PREFIX) {
            return Some(rest.to_string());
        }
        if !(reference.starts_with("http://") || reference.starts_with("https://")) {
            return None;
        }
        let url = reqwest::Url::parse(reference).ok()?;
        let rest = url.path().strip_prefix(STATIC_URL_PREFIX)?;
        urlencoding::decode(rest).ok().map(|s| s.into_owned())
    }

    /// Resolve a sub-path under the root.
    ///
    /// `.` and `..` are applied lexically; climbing above the root is a
    /// [`ImageGenError::PathTraversal`]. An existing path whose canonical form
    /// (symlinks followed) leaves the canonical root is rejected too.
    pub fn resolve_subpath(&self, subpath: &str) -> Result<PathBuf> {
        let traversal = || ImageGenError::PathTraversal(format!("{STATIC_URL_PREFIX}{subpath}"));

        let mut parts: Vec<&str> = Vec::new();
        for component in Path::new(subpath).components() {
            match component {
                Component::Normal(part) => parts.push(part.to_str().ok_or_else(traversal)?),
                Component::CurDir | Component::RootDir => {}
                Component::ParentDir => {
                    parts.pop().ok_or_else(traversal)?;
                }
                Component::Prefix(_) => return Err(traversal()),
            }
        }

        let path = parts.iter().fold(self.root.clone(), |path, part| path.join(part));

        if path.exists() {
            let canonical_root = self.root.canonicalize()?;
            let canonical = path.canonicalize()?;
            if !canonical.starts_with(&canonical_root) {
                return Err(traversal());
            }
        }
        Ok(path)
    }

    /// Local path of `reference`, or `None` when it is not a (safe) local
    /// reference. Traversal attempts are logged and treated as not local.
    pub fn resolve(&self, reference: &str) -> Option<PathBuf> {
        let subpath = Self::static_subpath(reference)?;
        match self.resolve_subpath(&subpath) {
            Ok(path) => Some(path),
            Err(e) => {
                tracing::warn!(
                    target: "pixelrelay::storage",
                    reference,
                    err = %e,
                    "rejected static reference"
                );
                None
            }
        }
    }

    /// Public reference of a file saved under the images directory.
    pub fn image_reference(filename: &str) -> String {
        format!("{STATIC_URL_PREFIX}{IMAGES_SUBDIR}/{filename}")
    }

    /// Write `bytes` to `<root>/images/<filename>` and return its public reference.
    pub async fn save_image(&self, filename: &str, bytes: &[u8]) -> Result<String> {
        let dir = self.images_dir();
        tokio::fs::create_dir_all(&dir).await?;
        let path = dir.join(filename);
        tokio::fs::write(&path, bytes).await?;
        tracing::info!(
            target: "pixelrelay::storage",
            path = %path.display(),
            bytes = bytes.len(),
            "saved image"
        );
        Ok(Self::image_reference(filename))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_local_references() {
        assert_eq!(
            StaticRoot::static_subpath("/static/images/a.png").as_deref(),
            Some("images/a.png")
        );
        assert_eq!(
            StaticRoot::static_subpath("http://localhost:8000/static/images/a%20b.png").as_deref(),
            Some("images/a b.png")
        );
        assert_eq!(StaticRoot::static_subpath("http://cdn/images/a.png"), None);
        assert_eq!(StaticRoot::static_subpath("static/a.png"), None);
        assert_eq!(StaticRoot::static_subpath("data:image/png;base64,AA"), None);
    }

    #[test]
    fn traversal_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let root = StaticRoot::new(dir.path());
        assert!(matches!(
            root.resolve_subpath("../../etc/passwd"),
            Err(ImageGenError::PathTraversal(_))
        ));
        assert_eq!(root.resolve("/static/../../etc/passwd"), None);
        assert_eq!(root.resolve("http://host/static/../../../etc/passwd"), None);
    }

    #[test]
    fn inner_parent_dirs_are_normalized() {
        let dir = tempfile::tempdir().unwrap();
        let root = StaticRoot::new(dir.path());
        assert_eq!(
            root.resolve("/static/images/../images/./a.png"),
            Some(dir.path().join("images").join("a.png"))
        );
    }

    #[cfg(unix)]
    #[test]
    fn symlink_escaping_the_root_is_rejected() {
        let outside = tempfile::tempdir().unwrap();
        std::fs::write(outside.path().join("secret.png"), b"x").unwrap();
        let dir = tempfile::tempdir().unwrap();
        std::os::unix::fs::symlink(outside.path(), dir.path().join("link")).unwrap();

        let root = StaticRoot::new(dir.path());
        assert!(matches!(
            root.resolve_subpath("link/secret.png"),
            Err(ImageGenError::PathTraversal(_))
        ));
    }

    #[tokio::test]
    async fn save_image_writes_under_images() {
        let dir = tempfile::tempdir().unwrap();
        let root = StaticRoot::new(dir.path());
        let reference = root.save_image("x.png", b"png").await.unwrap();
        assert_eq!(reference, "/static/images/x.png");
        assert_eq!(
            std::fs::read(dir.path().join("images/x.png")).unwrap(),
            b"png"
        );
    }
}
