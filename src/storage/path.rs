//! Virtual paths
//!
//! Clients only ever see paths rooted at `/`. Resolution is purely lexical and
//! can never climb above the root, so a resolved path always maps inside the
//! server root directory.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::StorageError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct VirtualPath {
    segments: Vec<String>,
}

impl VirtualPath {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Resolves `input` against `self`. Absolute inputs start over from the root,
    /// `..` stops at the root.
    pub fn resolve(&self, input: &str) -> Result<VirtualPath, StorageError> {
        if input.contains('\0') {
            return Err(StorageError::InvalidName(input.to_string()));
        }

        let mut resolved = if input.starts_with('/') {
            VirtualPath::root()
        } else {
            self.clone()
        };

        for segment in input.split(['/', '\\']) {
            match segment {
                "" | "." => {}
                ".." => {
                    resolved.segments.pop();
                }
                name => resolved.segments.push(name.to_string()),
            }
        }

        Ok(resolved)
    }

    pub fn parent(&self) -> VirtualPath {
        let mut parent = self.clone();
        parent.segments.pop();
        parent
    }

    pub fn file_name(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// Maps the virtual path onto a directory of the real filesystem.
    pub fn to_real_path(&self, root: &Path) -> PathBuf {
        let mut real = root.to_path_buf();
        real.extend(&self.segments);
        real
    }
}

impl fmt::Display for VirtualPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return f.write_str("/");
        }
        for segment in &self.segments {
            write!(f, "/{}", segment)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(p: &str) -> VirtualPath {
        VirtualPath::root().resolve(p).unwrap()
    }

    #[test]
    fn test_root_display() {
        assert_eq!(VirtualPath::root().to_string(), "/");
        assert!(VirtualPath::root().is_root());
    }

    #[test]
    fn test_relative_and_absolute_resolution() {
        let cwd = path("/pub/docs");
        assert_eq!(cwd.resolve("notes").unwrap().to_string(), "/pub/docs/notes");
        assert_eq!(cwd.resolve("/etc").unwrap().to_string(), "/etc");
        assert_eq!(cwd.resolve("./a//b/").unwrap().to_string(), "/pub/docs/a/b");
    }

    #[test]
    fn test_parent_traversal_is_clamped_at_root() {
        let cwd = path("/pub");
        assert_eq!(cwd.resolve("../../../etc/passwd").unwrap().to_string(), "/etc/passwd");
        assert_eq!(cwd.resolve("..").unwrap(), VirtualPath::root());
        assert_eq!(VirtualPath::root().parent(), VirtualPath::root());
    }

    #[test]
    fn test_nul_is_rejected() {
        assert!(matches!(
            VirtualPath::root().resolve("bad\0name"),
            Err(StorageError::InvalidName(_))
        ));
    }

    #[test]
    fn test_real_path_stays_under_root() {
        let root = Path::new("/srv/ftp");
        let real = path("/../a/b.txt").to_real_path(root);
        assert_eq!(real, PathBuf::from("/srv/ftp/a/b.txt"));
        assert_eq!(path("/a/b.txt").file_name(), Some("b.txt"));
    }
}
