//! Output: render tables and deliver them.
//!
//! This module handles the final stage of the pipeline, turning a
//! [`TableBody`](crate::TableBody) into something a reader sees:
//!
//! - **Destination**: a backend keyword or a file path, resolved against
//!   [`Settings`] before any I/O happens
//! - **Backend**: closed set of renderers (`plain`, `typeset`, `cells`,
//!   `grid`, `office`) sharing one `render` contract
//! - **OutputDispatcher**: flattens headers for span-incapable targets,
//!   renders, and writes files or returns the artifact
//!
//! ## Example
//!
//! ```rust
//! use baltablib::output::{Artifact, OutputDispatcher, Settings};
//! use baltablib::TableBody;
//!
//! let mut table = TableBody::new(vec!["".into(), "Mean".into()]);
//! table.push_row(vec!["age".into(), "41.250".into()], baltablib::RowOrigin::Manual).unwrap();
//!
//! let dispatcher = OutputDispatcher::new(Settings::default());
//! let html = dispatcher.dispatch(table, "html").unwrap();
//! assert!(matches!(html, Some(Artifact::Text(ref s)) if s.contains("<table")));
//! ```

pub mod dispatch;
pub mod render;
pub mod settings;

pub use dispatch::{Artifact, ArtifactWriter, Backend, Destination, Format, OutputDispatcher};
pub use render::{escape_html, escape_latex, text_lines, TextLine};
pub use settings::Settings;
