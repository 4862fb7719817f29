//! Terminal rendering of plain tables

use baltablib::output::{text_lines, TextLine};
use baltablib::TableBody;
use console::Style;

/// Render a table for the terminal: bold title and header, dim rules and
/// notes. Layout comes from the library's aligned text renderer.
pub fn render_table(table: &TableBody) -> baltablib::Result<String> {
    let bold = Style::new().bold();
    let dim = Style::new().dim();

    let lines: Vec<String> = text_lines(table, false)?
        .into_iter()
        .map(|line| match line {
            TextLine::Title(s) | TextLine::Header(s) => bold.apply_to(s).to_string(),
            TextLine::Rule(s) | TextLine::Note(s) => dim.apply_to(s).to_string(),
            TextLine::Row(s) => s,
        })
        .collect();
    Ok(lines.join("\n"))
}
