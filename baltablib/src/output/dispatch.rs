//! Output destinations and dispatch.
//!
//! A destination string is either a backend keyword (`plain`, `html`,
//! `latex`, `markdown`, `cells`, `grid`, `office`) or a file path whose
//! extension selects the format. Keyword destinations return the rendered
//! artifact; file destinations are written and return nothing.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::settings::Settings;
use crate::error::BalanceError;
use crate::table::TableBody;
use crate::Result;

/// Table rendering engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// The in-memory table itself, or aligned text
    Plain,
    /// Publication style: booktabs LaTeX, clean HTML, pipe Markdown
    Typeset,
    /// Cell-styled tables with spanner rows; also images
    Cells,
    /// Fully ruled grid tables
    Grid,
    /// Word processor and slide documents
    Office,
}

impl Backend {
    pub const ALL: [Backend; 5] = [
        Backend::Plain,
        Backend::Typeset,
        Backend::Cells,
        Backend::Grid,
        Backend::Office,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Backend::Plain => "plain",
            Backend::Typeset => "typeset",
            Backend::Cells => "cells",
            Backend::Grid => "grid",
            Backend::Office => "office",
        }
    }

    /// Whether the backend can produce the format.
    pub fn supports(&self, format: Format) -> bool {
        use Format::*;
        match self {
            Backend::Plain => matches!(format, Plain | Markdown),
            Backend::Typeset => matches!(format, Html | Latex | Markdown),
            Backend::Cells => matches!(format, Html | Latex | Image),
            Backend::Grid => matches!(format, Plain | Html | Latex | Markdown),
            Backend::Office => matches!(format, Word | Slide),
        }
    }

    /// Whether the backend can draw header spans.
    pub fn supports_spans(&self) -> bool {
        !matches!(self, Backend::Plain)
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Plain,
    Html,
    Latex,
    Markdown,
    Word,
    Slide,
    Image,
}

impl Format {
    /// Map a file extension (case-insensitive) to a format.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "html" => Some(Format::Html),
            "tex" => Some(Format::Latex),
            "md" | "txt" => Some(Format::Markdown),
            "rtf" | "docx" => Some(Format::Word),
            "pptx" => Some(Format::Slide),
            "png" | "jpg" => Some(Format::Image),
            _ => None,
        }
    }

    /// Whether the format can show header spans.
    pub fn supports_spans(&self) -> bool {
        !matches!(self, Format::Markdown)
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Format::Plain => "plain",
            Format::Html => "html",
            Format::Latex => "latex",
            Format::Markdown => "markdown",
            Format::Word => "word",
            Format::Slide => "slide",
            Format::Image => "image",
        };
        f.write_str(name)
    }
}

/// A resolved output destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    /// Render in memory and return the artifact
    Keyword { backend: Backend, format: Format },
    /// Render and write to a file
    File {
        path: PathBuf,
        backend: Backend,
        format: Format,
    },
}

impl Destination {
    /// Resolve a keyword or file path. Performs no I/O.
    pub fn resolve(spec: &str, settings: &Settings) -> Result<Self> {
        let spec = spec.trim();
        let path = Path::new(spec);

        let destination = match path.extension().and_then(|e| e.to_str()) {
            Some(ext) => {
                let format = Format::from_extension(ext).ok_or_else(|| {
                    BalanceError::UnsupportedOutput(format!(
                        "unknown file extension '.{}' in '{}'",
                        ext, spec
                    ))
                })?;
                Destination::File {
                    path: path.to_path_buf(),
                    backend: settings.backend_for(format),
                    format,
                }
            }
            None => {
                let (backend, format) = match spec.to_ascii_lowercase().as_str() {
                    "plain" | "dataframe" => (Backend::Plain, Format::Plain),
                    "html" => (settings.html, Format::Html),
                    "latex" => (settings.latex, Format::Latex),
                    "markdown" => (settings.markdown, Format::Markdown),
                    "cells" => (Backend::Cells, Format::Html),
                    "grid" => (Backend::Grid, Format::Plain),
                    "office" => (Backend::Office, Format::Word),
                    _ => {
                        return Err(BalanceError::UnsupportedOutput(format!(
                            "unknown output '{}'",
                            spec
                        )))
                    }
                };
                Destination::Keyword { backend, format }
            }
        };

        let (backend, format) = (destination.backend(), destination.format());
        if !backend.supports(format) {
            return Err(BalanceError::UnsupportedOutput(format!(
                "backend '{}' cannot produce {} output",
                backend, format
            )));
        }
        Ok(destination)
    }

    pub fn backend(&self) -> Backend {
        match self {
            Destination::Keyword { backend, .. } | Destination::File { backend, .. } => *backend,
        }
    }

    pub fn format(&self) -> Format {
        match self {
            Destination::Keyword { format, .. } | Destination::File { format, .. } => *format,
        }
    }

    /// Whether writing this destination produces a binary document.
    pub fn is_binary(&self) -> bool {
        match self {
            Destination::Keyword { .. } => false,
            Destination::File { path, format, .. } => match format {
                Format::Slide | Format::Image => true,
                Format::Word => !path
                    .extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e.eq_ignore_ascii_case("rtf")),
                _ => false,
            },
        }
    }
}

/// A rendered table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Artifact {
    /// The table body itself (plain in-memory output)
    Table(TableBody),
    /// Rendered markup or text
    Text(String),
}

impl Artifact {
    /// Rendered text, if any.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Artifact::Text(text) => Some(text),
            Artifact::Table(_) => None,
        }
    }
}

/// Writes binary documents (Word, slides, images).
///
/// The library produces text formats itself; binary formats are delegated
/// to a writer supplied by the caller.
pub trait ArtifactWriter {
    fn write(&self, table: &TableBody, backend: Backend, format: Format, path: &Path)
        -> Result<()>;
}

/// Resolves destinations, renders tables and writes files.
#[derive(Default)]
pub struct OutputDispatcher {
    settings: Settings,
    writer: Option<Box<dyn ArtifactWriter>>,
}

impl OutputDispatcher {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            writer: None,
        }
    }

    /// Attach a writer for binary formats.
    pub fn with_writer(mut self, writer: Box<dyn ArtifactWriter>) -> Self {
        self.writer = Some(writer);
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Render `table` to `destination`.
    ///
    /// Returns the artifact for keyword destinations and `None` after a file
    /// has been written. The destination is fully validated before any
    /// file is touched.
    pub fn dispatch(&self, table: TableBody, destination: &str) -> Result<Option<Artifact>> {
        let destination = Destination::resolve(destination, &self.settings)?;
        let (backend, format) = (destination.backend(), destination.format());
        table.validate()?;

        let table = if !backend.supports_spans() || !format.supports_spans() {
            log::debug!("flattening header for {} / {}", backend, format);
            table.flatten_header()
        } else {
            table
        };

        match &destination {
            Destination::Keyword { .. } => {
                let artifact = backend.render(&table, format, self.settings.escape)?;
                Ok(Some(artifact))
            }
            Destination::File { path, .. } if destination.is_binary() => {
                let writer = self.writer.as_ref().ok_or_else(|| {
                    BalanceError::UnsupportedOutput(format!(
                        "no writer available for {} files ({})",
                        format,
                        path.display()
                    ))
                })?;
                writer.write(&table, backend, format, path)?;
                log::debug!("wrote {} via {} writer to {}", format, backend, path.display());
                Ok(None)
            }
            Destination::File { path, .. } => {
                match backend.render(&table, format, self.settings.escape)? {
                    Artifact::Text(text) => std::fs::write(path, text)?,
                    Artifact::Table(_) => {
                        return Err(BalanceError::UnsupportedOutput(format!(
                            "backend '{}' cannot write {} files",
                            backend, format
                        )))
                    }
                }
                log::debug!("wrote {} via {} to {}", format, backend, path.display());
                Ok(None)
            }
        }
    }
}
