//! Backend renderers.
//!
//! Every backend shares one contract, [`Backend::render`], and produces a
//! deterministic artifact for the formats it supports. Text formats are
//! built here directly; binary formats never reach this module.

use super::dispatch::{Artifact, Backend, Format};
use crate::error::BalanceError;
use crate::table::{Align, HeaderSpan, TableBody};
use crate::Result;

impl Backend {
    /// Render a table body in the given format.
    ///
    /// `escape` controls HTML and LaTeX escaping of cell text.
    pub fn render(&self, body: &TableBody, format: Format, escape: bool) -> Result<Artifact> {
        body.validate()?;
        let text = match (self, format) {
            (Backend::Plain, Format::Plain) => return Ok(Artifact::Table(body.clone())),
            (Backend::Plain, Format::Markdown) => text_table(body, false),
            (Backend::Grid, Format::Plain) => text_table(body, true),
            (Backend::Typeset | Backend::Cells | Backend::Grid, Format::Html) => {
                html(body, *self, escape)
            }
            (Backend::Typeset | Backend::Cells | Backend::Grid, Format::Latex) => {
                latex(body, *self, escape)
            }
            (Backend::Typeset | Backend::Grid, Format::Markdown) => markdown(body),
            (Backend::Office, Format::Word) => rtf(body),
            _ => {
                return Err(BalanceError::UnsupportedOutput(format!(
                    "backend '{}' cannot render {} output as text",
                    self, format
                )))
            }
        };
        Ok(Artifact::Text(text))
    }
}

/// Escape HTML special characters.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Escape LaTeX special characters.
pub fn escape_latex(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\textbackslash{}"),
            '&' | '%' | '$' | '#' | '_' | '{' | '}' => {
                out.push('\\');
                out.push(c);
            }
            '~' => out.push_str("\\textasciitilde{}"),
            '^' => out.push_str("\\textasciicircum{}"),
            _ => out.push(c),
        }
    }
    out
}

fn css_align(align: Align) -> &'static str {
    match align {
        Align::Left => "left",
        Align::Center => "center",
        Align::Right => "right",
    }
}

fn html(body: &TableBody, backend: Backend, escape: bool) -> String {
    let esc = |s: &str| {
        if escape {
            escape_html(s)
        } else {
            s.to_string()
        }
    };
    let align = |i: usize| css_align(body.meta.align.get(i).copied().unwrap_or_default());

    let mut out = String::new();
    match backend {
        Backend::Grid => out.push_str("<table class=\"baltab baltab-grid\" border=\"1\">\n"),
        _ => out.push_str(&format!("<table class=\"baltab baltab-{}\">\n", backend)),
    }
    if let Some(title) = &body.meta.title {
        out.push_str(&format!("  <caption>{}</caption>\n", esc(title)));
    }

    out.push_str("  <thead>\n");
    for level in &body.meta.spans {
        out.push_str("    <tr>");
        for span in level {
            if span.is_blank() {
                out.push_str(&format!("<th colspan=\"{}\"></th>", span.width));
            } else if backend == Backend::Cells {
                out.push_str(&format!(
                    "<th colspan=\"{}\" class=\"spanner\">{}</th>",
                    span.width,
                    esc(&span.label)
                ));
            } else {
                out.push_str(&format!(
                    "<th colspan=\"{}\" style=\"text-align: center; border-bottom: 1px solid;\">{}</th>",
                    span.width,
                    esc(&span.label)
                ));
            }
        }
        out.push_str("</tr>\n");
    }
    out.push_str("    <tr>");
    for (i, name) in body.columns.iter().enumerate() {
        out.push_str(&format!(
            "<th style=\"text-align: {};\">{}</th>",
            align(i),
            esc(name)
        ));
    }
    out.push_str("</tr>\n  </thead>\n  <tbody>\n");

    for (r, row) in body.rows.iter().enumerate() {
        // Row borders are ignored in the separated border model.
        let rule = if body.has_rule_after(r) {
            " border-bottom: 1px solid;"
        } else {
            ""
        };
        out.push_str("    <tr>");
        for (i, cell) in row.iter().enumerate() {
            out.push_str(&format!(
                "<td style=\"text-align: {};{}\">{}</td>",
                align(i),
                rule,
                esc(cell)
            ));
        }
        out.push_str("</tr>\n");
    }
    out.push_str("  </tbody>\n");

    if !body.meta.notes.is_empty() {
        out.push_str("  <tfoot>\n");
        for note in &body.meta.notes {
            out.push_str(&format!(
                "    <tr><td colspan=\"{}\">{}</td></tr>\n",
                body.ncols(),
                esc(note)
            ));
        }
        out.push_str("  </tfoot>\n");
    }
    out.push_str("</table>\n");
    out
}

fn latex(body: &TableBody, backend: Backend, escape: bool) -> String {
    let esc = |s: &str| {
        if escape {
            escape_latex(s)
        } else {
            s.to_string()
        }
    };
    let grid = backend == Backend::Grid;
    let row_end = " \\\\\n";

    let codes: Vec<String> = body.meta.align.iter().map(|a| a.code().to_string()).collect();
    let spec = if grid {
        format!("|{}|", codes.join("|"))
    } else {
        codes.concat()
    };

    let mut out = String::from("\\begin{table}[htbp]\n\\centering\n");
    if let Some(title) = &body.meta.title {
        out.push_str(&format!("\\caption{{{}}}\n", esc(title)));
    }
    out.push_str(&format!("\\begin{{tabular}}{{{}}}\n", spec));
    out.push_str(if grid { "\\hline\n" } else { "\\toprule\n" });

    for level in &body.meta.spans {
        let starts = TableBody::span_starts(level);
        let cells: Vec<String> = level
            .iter()
            .zip(&starts)
            .map(|(span, &start)| latex_span(span, start, backend, &esc))
            .collect();
        out.push_str(&cells.join(" & "));
        out.push_str(row_end);

        let rules: Vec<String> = level
            .iter()
            .zip(&starts)
            .filter(|(span, _)| !span.is_blank())
            .map(|(span, &start)| {
                let range = format!("{}-{}", start + 1, start + span.width);
                if grid {
                    format!("\\cline{{{}}}", range)
                } else {
                    format!("\\cmidrule(lr){{{}}}", range)
                }
            })
            .collect();
        if !rules.is_empty() {
            out.push_str(&rules.join(" "));
            out.push('\n');
        }
    }

    let header: Vec<String> = body.columns.iter().map(|c| esc(c)).collect();
    out.push_str(&header.join(" & "));
    out.push_str(row_end);
    out.push_str(if grid { "\\hline\n" } else { "\\midrule\n" });

    for (r, row) in body.rows.iter().enumerate() {
        let cells: Vec<String> = row.iter().map(|c| esc(c)).collect();
        out.push_str(&cells.join(" & "));
        out.push_str(row_end);
        let ruled = body.has_rule_after(r);
        if grid {
            out.push_str(if ruled { "\\hline\\hline\n" } else { "\\hline\n" });
        } else if ruled {
            out.push_str("\\midrule\n");
        }
    }
    if !grid {
        out.push_str("\\bottomrule\n");
    }

    for note in &body.meta.notes {
        out.push_str(&format!(
            "\\multicolumn{{{}}}{{l}}{{\\footnotesize {}}}{}",
            body.ncols(),
            esc(note),
            row_end
        ));
    }
    out.push_str("\\end{tabular}\n\\end{table}\n");
    out
}

fn latex_span(
    span: &HeaderSpan,
    start: usize,
    backend: Backend,
    esc: &dyn Fn(&str) -> String,
) -> String {
    let label = match backend {
        Backend::Cells if !span.is_blank() => format!("\\textbf{{{}}}", esc(&span.label)),
        _ => esc(&span.label),
    };
    if span.width == 1 && span.is_blank() {
        return String::new();
    }
    let spec = match backend {
        Backend::Grid if start == 0 => "|c|",
        Backend::Grid => "c|",
        _ => "c",
    };
    format!("\\multicolumn{{{}}}{{{}}}{{{}}}", span.width, spec, label)
}

fn markdown(body: &TableBody) -> String {
    let cell = |s: &str| s.replace('|', "\\|");
    let line = |cells: Vec<String>| format!("| {} |\n", cells.join(" | "));

    let mut out = String::new();
    if let Some(title) = &body.meta.title {
        out.push_str(&format!("Table: {}\n\n", title));
    }
    out.push_str(&line(body.columns.iter().map(|c| cell(c)).collect()));
    out.push_str(&line(
        body.meta
            .align
            .iter()
            .map(|a| match a {
                Align::Left => ":---".to_string(),
                Align::Center => ":---:".to_string(),
                Align::Right => "---:".to_string(),
            })
            .collect(),
    ));
    for row in &body.rows {
        out.push_str(&line(row.iter().map(|c| cell(c)).collect()));
    }
    if !body.meta.notes.is_empty() {
        out.push('\n');
        for note in &body.meta.notes {
            out.push_str(note);
            out.push('\n');
        }
    }
    out
}

fn pad(s: &str, width: usize, align: Align) -> String {
    let len = s.chars().count();
    let fill = width.saturating_sub(len);
    match align {
        Align::Left => format!("{}{}", s, " ".repeat(fill)),
        Align::Right => format!("{}{}", " ".repeat(fill), s),
        Align::Center => {
            let left = fill / 2;
            format!("{}{}{}", " ".repeat(left), s, " ".repeat(fill - left))
        }
    }
}

/// One line of an aligned text table, tagged with its role so callers can
/// style it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextLine {
    Title(String),
    /// Span rows (grid only) and the column header
    Header(String),
    Rule(String),
    Row(String),
    Note(String),
}

impl TextLine {
    pub fn text(&self) -> &str {
        match self {
            TextLine::Title(s)
            | TextLine::Header(s)
            | TextLine::Rule(s)
            | TextLine::Row(s)
            | TextLine::Note(s) => s,
        }
    }
}

/// Lay out an aligned text table line by line. `grid` draws borders and
/// span rows.
pub fn text_lines(body: &TableBody, grid: bool) -> Result<Vec<TextLine>> {
    body.validate()?;
    Ok(layout_text(body, grid))
}

fn layout_text(body: &TableBody, grid: bool) -> Vec<TextLine> {
    let sep = if grid { " | " } else { "  " };
    let sep_width = sep.len();

    let mut widths: Vec<usize> = body.columns.iter().map(|c| c.chars().count()).collect();
    for row in &body.rows {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.chars().count());
        }
    }
    // Widen the last column under a span whose label does not fit.
    if grid {
        for level in &body.meta.spans {
            for (span, start) in level.iter().zip(TableBody::span_starts(level)) {
                let covered: usize = widths[start..start + span.width].iter().sum::<usize>()
                    + sep_width * (span.width - 1);
                let needed = span.label.chars().count();
                if needed > covered {
                    widths[start + span.width - 1] += needed - covered;
                }
            }
        }
    }

    let align = |i: usize| body.meta.align.get(i).copied().unwrap_or_default();
    let line = |cells: Vec<String>| {
        if grid {
            format!("| {} |", cells.join(sep))
        } else {
            cells.join(sep).trim_end().to_string()
        }
    };
    let border = |c: char| {
        let text = if grid {
            let parts: Vec<String> = widths.iter().map(|w| c.to_string().repeat(w + 2)).collect();
            format!("+{}+", parts.join("+"))
        } else {
            let total = widths.iter().sum::<usize>() + sep_width * widths.len().saturating_sub(1);
            c.to_string().repeat(total)
        };
        TextLine::Rule(text)
    };
    let padded = |cells: &[String]| -> Vec<String> {
        cells
            .iter()
            .enumerate()
            .map(|(i, c)| pad(c, widths[i], align(i)))
            .collect()
    };

    let mut out = Vec::new();
    if let Some(title) = &body.meta.title {
        out.push(TextLine::Title(title.clone()));
    }
    if grid {
        out.push(border('-'));
        for level in &body.meta.spans {
            let cells = level
                .iter()
                .zip(TableBody::span_starts(level))
                .map(|(span, start)| {
                    let width = widths[start..start + span.width].iter().sum::<usize>()
                        + sep_width * (span.width - 1);
                    pad(&span.label, width, Align::Center)
                })
                .collect();
            out.push(TextLine::Header(line(cells)));
            out.push(border('-'));
        }
    }

    out.push(TextLine::Header(line(padded(&body.columns))));
    out.push(border(if grid { '=' } else { '-' }));

    for (r, row) in body.rows.iter().enumerate() {
        out.push(TextLine::Row(line(padded(row))));
        if body.has_rule_after(r) {
            out.push(border(if grid { '=' } else { '-' }));
        } else if grid {
            out.push(border('-'));
        }
    }

    for note in &body.meta.notes {
        out.push(TextLine::Note(note.clone()));
    }
    out
}

fn text_table(body: &TableBody, grid: bool) -> String {
    layout_text(body, grid)
        .iter()
        .map(|l| format!("{}\n", l.text()))
        .collect()
}

fn escape_rtf(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' | '{' | '}' => {
                out.push('\\');
                out.push(c);
            }
            c if c.is_ascii() => out.push(c),
            c => {
                let mut units = [0u16; 2];
                for unit in c.encode_utf16(&mut units) {
                    out.push_str(&format!("\\u{}?", *unit as i16));
                }
            }
        }
    }
    out
}

/// Twips per column: wide label column, narrower value columns.
const RTF_LABEL_WIDTH: usize = 2880;
const RTF_CELL_WIDTH: usize = 1200;

fn rtf(body: &TableBody) -> String {
    let rights: Vec<usize> = (0..body.ncols())
        .scan(0, |edge, i| {
            *edge += if i == 0 { RTF_LABEL_WIDTH } else { RTF_CELL_WIDTH };
            Some(*edge)
        })
        .collect();
    let qual = |a: Align| match a {
        Align::Left => "\\ql",
        Align::Center => "\\qc",
        Align::Right => "\\qr",
    };

    let mut out = String::from("{\\rtf1\\ansi\\deff0\n{\\fonttbl{\\f0 Times New Roman;}}\n");
    if let Some(title) = &body.meta.title {
        out.push_str(&format!("\\pard\\plain\\f0\\fs20\\b {}\\b0\\par\n", escape_rtf(title)));
    }

    for level in &body.meta.spans {
        out.push_str("\\trowd\\trgaph108");
        for (span, start) in level.iter().zip(TableBody::span_starts(level)) {
            for k in 0..span.width {
                let merge = match (span.width, k) {
                    (1, _) => "",
                    (_, 0) => "\\clmgf",
                    _ => "\\clmrg",
                };
                out.push_str(&format!("{}\\cellx{}", merge, rights[start + k]));
            }
        }
        out.push('\n');
        for span in level {
            out.push_str(&format!("\\pard\\intbl\\qc {}\\cell", escape_rtf(&span.label)));
            for _ in 1..span.width {
                out.push_str("\\pard\\intbl\\cell");
            }
        }
        out.push_str("\\row\n");
    }

    let row_def = |ruled: bool| {
        let mut def = String::from("\\trowd\\trgaph108");
        for edge in &rights {
            if ruled {
                def.push_str("\\clbrdrb\\brdrs\\brdrw10");
            }
            def.push_str(&format!("\\cellx{}", edge));
        }
        def.push('\n');
        def
    };

    out.push_str(&row_def(true));
    for (i, name) in body.columns.iter().enumerate() {
        out.push_str(&format!(
            "\\pard\\intbl{}\\b {}\\b0\\cell",
            qual(body.meta.align.get(i).copied().unwrap_or_default()),
            escape_rtf(name)
        ));
    }
    out.push_str("\\row\n");

    for (r, row) in body.rows.iter().enumerate() {
        out.push_str(&row_def(body.has_rule_after(r)));
        for (i, cell) in row.iter().enumerate() {
            out.push_str(&format!(
                "\\pard\\intbl{} {}\\cell",
                qual(body.meta.align.get(i).copied().unwrap_or_default()),
                escape_rtf(cell)
            ));
        }
        out.push_str("\\row\n");
    }

    for note in &body.meta.notes {
        out.push_str(&format!("\\pard\\plain\\f0\\fs16 {}\\par\n", escape_rtf(note)));
    }
    out.push_str("}\n");
    out
}
