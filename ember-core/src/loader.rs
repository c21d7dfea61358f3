use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::span::SourceFile;

/// Reads the files named by `include(...)`.
pub trait SourceLoader {
    fn load(&self, path: &str) -> io::Result<Arc<SourceFile>>;
}

/// Loads includes from the file system, resolving relative paths against
/// `base` when one is set and against the working directory otherwise.
#[derive(Debug, Clone, Default)]
pub struct FsLoader {
    base: Option<PathBuf>,
}

impl FsLoader {
    pub fn new() -> Self {
        FsLoader::default()
    }

    pub fn with_base(base: impl Into<PathBuf>) -> Self {
        FsLoader {
            base: Some(base.into()),
        }
    }

    pub fn resolve(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        match &self.base {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }
}

impl SourceLoader for FsLoader {
    fn load(&self, path: &str) -> io::Result<Arc<SourceFile>> {
        let resolved = self.resolve(path);
        log::debug!("loading include {path} from {}", resolved.display());
        let text = fs::read_to_string(&resolved)?;
        Ok(SourceFile::new(path, text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_relative_paths_against_base() {
        let loader = FsLoader::with_base("/scripts");
        assert_eq!(loader.resolve("lib/a.em"), PathBuf::from("/scripts/lib/a.em"));
        assert_eq!(loader.resolve("/abs.em"), PathBuf::from("/abs.em"));
        assert_eq!(FsLoader::new().resolve("a.em"), PathBuf::from("a.em"));
    }

    #[test]
    fn loads_files_from_base_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("lib.em"), "x = 1;").expect("write lib");
        let source = FsLoader::with_base(dir.path()).load("lib.em").expect("load");
        assert_eq!(source.name, "lib.em");
        assert_eq!(source.text, "x = 1;");
    }

    #[test]
    fn missing_files_are_io_errors() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = FsLoader::with_base(dir.path()).load("nope.em").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
