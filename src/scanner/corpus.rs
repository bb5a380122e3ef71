//! Reference index: the snapshot of text files eligible for reference rewriting.
//!
//! Built exactly once per run, before any candidate is processed. Every
//! rewrite and every deletion decision in the run is made against this same
//! file list.

#![allow(missing_docs)]

use std::fs;
use std::path::{Path, PathBuf};

use crate::core::config::Config;
use crate::core::errors::{AoptError, Result};
use crate::scanner::patterns::{ExtensionSet, text_extension_set};
use crate::scanner::walker::{DirectoryWalker, WalkerConfig};

/// Ordered set of text-like files under the project root.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextCorpus {
    files: Vec<PathBuf>,
}

impl TextCorpus {
    /// Wrap an explicit file list (kept in the given order).
    pub fn from_files(files: Vec<PathBuf>) -> Self {
        Self { files }
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Read one corpus file as raw bytes.
    pub fn read(path: &Path) -> Result<Vec<u8>> {
        fs::read(path).map_err(|e| AoptError::io(path, e))
    }
}

/// Builds the [`TextCorpus`].
#[derive(Debug, Clone)]
pub struct CorpusBuilder {
    root: PathBuf,
    excluded_dirs: Vec<String>,
    text_extensions: ExtensionSet,
}

impl CorpusBuilder {
    pub fn new(
        root: impl Into<PathBuf>,
        excluded_dirs: Vec<String>,
        text_extensions: ExtensionSet,
    ) -> Self {
        Self {
            root: root.into(),
            excluded_dirs,
            text_extensions,
        }
    }

    pub fn from_config(config: &Config, root: &Path) -> Self {
        Self::new(
            root,
            config.corpus.excluded_dirs.clone(),
            text_extension_set(&config.corpus.text_extensions),
        )
    }

    /// Walk the project tree once and collect text files.
    pub fn build(&self) -> Result<TextCorpus> {
        if !self.root.is_dir() {
            return Err(AoptError::MissingRoot {
                path: self.root.clone(),
            });
        }
        let walker = DirectoryWalker::new(
            WalkerConfig::new(&self.root).excluding(self.excluded_dirs.iter().cloned()),
        );
        let files = walker
            .walk_files(|p| self.text_extensions.matches(p))?
            .into_iter()
            .map(|e| e.path)
            .collect();
        Ok(TextCorpus { files })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::paths::relative_posix;

    fn write(path: &Path, text: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, text).unwrap();
    }

    #[test]
    fn collects_text_files_and_prunes_excluded_dirs() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        write(&root.join("README.md"), "# hi");
        write(&root.join("content").join("post.mdx"), "x");
        write(&root.join("src").join("app").join("page.tsx"), "x");
        write(&root.join("src").join("styles.SCSS"), "x");
        write(&root.join("node_modules").join("lib").join("index.js"), "x");
        write(&root.join(".next").join("cache.json"), "x");
        write(&root.join("out").join("index.txt"), "x");
        write(&root.join("public").join("images").join("a.png"), "x");
        write(&root.join("public").join("robots.txt"), "x");
        write(&root.join("Cargo.lock"), "x");

        let corpus = CorpusBuilder::from_config(&Config::default(), root)
            .build()
            .unwrap();
        let rels: Vec<String> = corpus
            .files()
            .iter()
            .map(|p| relative_posix(root, p).unwrap())
            .collect();
        assert_eq!(
            rels,
            vec![
                "README.md",
                "content/post.mdx",
                "public/robots.txt",
                "src/app/page.tsx",
                "src/styles.SCSS",
            ]
        );
    }

    #[test]
    fn binary_extensions_stay_excluded_even_if_allow_listed() {
        let tmp = tempfile::tempdir().unwrap();
        write(&tmp.path().join("a.svg"), "<svg/>");
        write(&tmp.path().join("b.gif"), "GIF89a");

        let builder = CorpusBuilder::new(
            tmp.path(),
            Vec::new(),
            text_extension_set(&["svg", "gif"]),
        );
        let corpus = builder.build().unwrap();
        assert_eq!(corpus.len(), 1);
        assert!(corpus.files()[0].ends_with("a.svg"));
    }

    #[test]
    fn missing_root_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let builder = CorpusBuilder::from_config(&Config::default(), &tmp.path().join("nope"));
        assert!(builder.build().is_err());
    }
}
