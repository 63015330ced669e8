//! Diff report output in CSV or HTML.

use std::fs;
use std::io::Write;
use std::path::Path;

use crate::diagnostics::Diagnostics;
use crate::diff::{DiffMode, DiffReport};
use crate::error::{SmapsError, SmapsResult};
use crate::ingest::{generator, to_csv};
use crate::report::{page_footer, page_header};
use crate::table::{escape_html, render, Cell, Grid};

pub fn write_diff_csv<W: Write>(out: &mut W, report: &DiffReport, filtered: bool) -> std::io::Result<()> {
    writeln!(out, "generator={}", generator())?;
    for (i, source) in report.sources.iter().enumerate() {
        writeln!(out, "CAP{}={}", i + 1, source)?;
    }
    writeln!(out)?;
    for row in report.table(filtered) {
        let cells: Vec<String> = row.iter().map(|c| to_csv(c)).collect();
        writeln!(out, "{}", cells.join(","))?;
    }
    writeln!(out)
}

/// Diff table as a standalone page. Blank cells merge into the span of
/// the cell above or to the left, so repeated keys collapse. An all-blank
/// separator row stays a visible row of empty cells.
pub fn render_diff_html(report: &DiffReport, filtered: bool) -> String {
    let mut html = page_header("SMAPS DIFF");
    html.push_str("<h1>SMAPS DIFF</h1>\n<p>\n");
    for (i, source) in report.sources.iter().enumerate() {
        html.push_str(&format!("CAP{} = {}<br>\n", i + 1, escape_html(source)));
    }
    html.push_str("</p>\n");

    let cells: Vec<Vec<Cell>> = report
        .table(filtered)
        .into_iter()
        .map(|row| {
            if row.iter().all(String::is_empty) {
                return row.into_iter().map(Cell::Text).collect();
            }
            row.into_iter()
                .map(|c| if c.is_empty() { Cell::Merge } else { Cell::Text(c) })
                .collect()
        })
        .collect();
    html.push_str(&render(Grid::new(cells, 1, report.level.index())));

    html.push_str(&page_footer());
    html
}

/// Writes the report to `path`, or to stdout when no path is given.
pub fn save_diff(
    path: Option<&Path>,
    report: &DiffReport,
    mode: DiffMode,
    filtered: bool,
    diag: &Diagnostics,
) -> SmapsResult<()> {
    let mut buf = Vec::new();
    match mode {
        DiffMode::Csv => write_diff_csv(&mut buf, report, filtered).map_err(|e| SmapsError::io("<memory>", e))?,
        DiffMode::Html => buf.extend_from_slice(render_diff_html(report, filtered).as_bytes()),
    }

    match path {
        Some(path) => {
            diag.debug(&format!("{}: writing ...", path.display()));
            fs::write(path, &buf).map_err(|e| SmapsError::io(path, e))
        }
        None => {
            let stdout = std::io::stdout();
            let mut lock = stdout.lock();
            lock.write_all(&buf)
                .and_then(|_| lock.flush())
                .map_err(|e| SmapsError::io("<stdout>", e))
        }
    }
}
