//! Output settings: default backend per file format and escaping.
//!
//! Settings are an explicit value handed to the dispatcher. They can be
//! built in code or loaded from a TOML file:
//!
//! ```toml
//! html = "grid"
//! latex = "typeset"
//! escape = true
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::dispatch::{Backend, Format};
use crate::error::BalanceError;
use crate::Result;

/// Backend chosen for each file format, plus rendering switches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub html: Backend,
    pub latex: Backend,
    pub markdown: Backend,
    pub word: Backend,
    pub slide: Backend,
    pub image: Backend,
    /// Escape HTML and LaTeX special characters in cells
    pub escape: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            html: Backend::Typeset,
            latex: Backend::Typeset,
            markdown: Backend::Typeset,
            word: Backend::Office,
            slide: Backend::Office,
            image: Backend::Cells,
            escape: true,
        }
    }
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend used when writing a file of the given format.
    pub fn backend_for(&self, format: Format) -> Backend {
        match format {
            Format::Plain => Backend::Plain,
            Format::Html => self.html,
            Format::Latex => self.latex,
            Format::Markdown => self.markdown,
            Format::Word => self.word,
            Format::Slide => self.slide,
            Format::Image => self.image,
        }
    }

    /// Override the backend for one format.
    pub fn backend(mut self, format: Format, backend: Backend) -> Self {
        match format {
            Format::Plain => {}
            Format::Html => self.html = backend,
            Format::Latex => self.latex = backend,
            Format::Markdown => self.markdown = backend,
            Format::Word => self.word = backend,
            Format::Slide => self.slide = backend,
            Format::Image => self.image = backend,
        }
        self
    }

    /// Enable or disable escaping.
    pub fn escape(mut self, escape: bool) -> Self {
        self.escape = escape;
        self
    }

    /// Parse settings from TOML text. Missing keys keep their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Self::parse(text, PathBuf::from("<inline>"))
    }

    /// Load settings from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let settings = Self::parse(&text, path.to_path_buf())?;
        log::debug!("loaded output settings from {}", path.display());
        Ok(settings)
    }

    fn parse(text: &str, path: PathBuf) -> Result<Self> {
        toml::from_str(text).map_err(|e| BalanceError::Config {
            path,
            message: e.message().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.backend_for(Format::Html), Backend::Typeset);
        assert_eq!(settings.backend_for(Format::Word), Backend::Office);
        assert_eq!(settings.backend_for(Format::Image), Backend::Cells);
        assert_eq!(settings.backend_for(Format::Plain), Backend::Plain);
        assert!(settings.escape);
    }

    #[test]
    fn test_builder_overrides() {
        let settings = Settings::new()
            .backend(Format::Latex, Backend::Grid)
            .escape(false);
        assert_eq!(settings.backend_for(Format::Latex), Backend::Grid);
        assert_eq!(settings.backend_for(Format::Html), Backend::Typeset);
        assert!(!settings.escape);
    }

    #[test]
    fn test_from_toml_partial() {
        let settings = Settings::from_toml_str("html = \"grid\"\nescape = false\n").unwrap();
        assert_eq!(settings.html, Backend::Grid);
        assert_eq!(settings.latex, Backend::Typeset);
        assert!(!settings.escape);
    }

    #[test]
    fn test_from_toml_rejects_unknown() {
        let err = Settings::from_toml_str("html = \"fancy\"\n").unwrap_err();
        assert!(matches!(err, BalanceError::Config { .. }));
        assert!(Settings::from_toml_str("colour = true\n").is_err());
    }

    #[test]
    fn test_load_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "markdown = \"grid\"").unwrap();
        let settings = Settings::load(file.path()).unwrap();
        assert_eq!(settings.markdown, Backend::Grid);

        let missing = Settings::load(file.path().with_extension("missing"));
        assert!(matches!(missing, Err(BalanceError::Io(_))));
    }
}
