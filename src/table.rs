//! Span-merging table renderer.
//!
//! A [`Grid`] is a rectangle of [`Cell`]s where [`Cell::Merge`] means "belongs
//! to the span of a previous cell". Laying the grid out turns it into
//! row/column spans:
//!
//! 1. Header columns are collapsed vertically: repeated identical values
//!    below the header rows become merge markers.
//! 2. Every remaining cell grows downward over merge markers, then to the
//!    right, and the width is shrunk until every covered row is clear.
//! 3. Spans crossing the header boundary or a page boundary are split so
//!    the repeated header block stays self contained.
//!
//! Rendering emits plain HTML with header/data cell roles and 3-row banding.

use std::fmt::Write as _;

/// One grid cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cell {
    /// Covered by the span of a previous cell.
    Merge,
    /// Plain text, escaped when rendered.
    Text(String),
    /// Pre-rendered markup (links, line breaks), emitted verbatim.
    Html(String),
    Number(u64),
}

impl Cell {
    pub fn text(s: impl Into<String>) -> Self {
        Cell::Text(s.into())
    }

    pub fn html(s: impl Into<String>) -> Self {
        Cell::Html(s.into())
    }

    fn is_merge(&self) -> bool {
        matches!(self, Cell::Merge)
    }

    fn is_blank(&self) -> bool {
        match self {
            Cell::Text(s) | Cell::Html(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Header rendering: shown as is.
    fn label(&self) -> String {
        match self {
            Cell::Merge => String::new(),
            Cell::Text(s) => escape_html(s.trim()),
            Cell::Html(s) => s.trim().to_string(),
            Cell::Number(n) => n.to_string(),
        }
    }

    /// Data rendering: zero is displayed as `-`.
    fn value(&self) -> String {
        match self {
            Cell::Number(0) => "-".to_string(),
            Cell::Text(s) if s.trim() == "0" => "-".to_string(),
            other => other.label(),
        }
    }
}

impl From<u64> for Cell {
    fn from(n: u64) -> Self {
        Cell::Number(n)
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Cell::Text(s.to_string())
    }
}

impl From<String> for Cell {
    fn from(s: String) -> Self {
        Cell::Text(s)
    }
}

impl<T: Into<Cell>> From<Option<T>> for Cell {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Cell::Merge)
    }
}

pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Evenly sized pages: the smallest page count with at most `max` rows per
/// page, then the page size that spreads `rows` across them.
pub fn slice_rows(rows: usize, max: usize) -> Option<usize> {
    if rows == 0 || max == 0 {
        return None;
    }
    let pages = rows.div_ceil(max);
    Some(rows.div_ceil(pages))
}

/// How a span is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Header row cell; `highlight` is off only for the empty corner.
    Top { highlight: bool },
    /// Header column cell below the header rows.
    Side,
    /// Body cell; `shaded` alternates every three data rows.
    Data { shaded: bool },
}

/// One laid out cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    pub row: usize,
    pub col: usize,
    pub width: usize,
    pub height: usize,
    pub role: Role,
    pub cell: Cell,
}

/// Rectangular input to the renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid {
    cells: Vec<Vec<Cell>>,
    header_rows: usize,
    header_cols: usize,
    page_rows: Option<usize>,
}

impl Grid {
    /// Short rows are padded with merge markers.
    pub fn new(mut cells: Vec<Vec<Cell>>, header_rows: usize, header_cols: usize) -> Self {
        let cols = cells.iter().map(Vec::len).max().unwrap_or(0);
        for row in cells.iter_mut() {
            row.resize(cols, Cell::Merge);
        }
        Self {
            cells,
            header_rows,
            header_cols,
            page_rows: None,
        }
    }

    /// Repeats the header rows every `rows` data rows.
    pub fn paginate(mut self, rows: Option<usize>) -> Self {
        self.page_rows = rows.filter(|&n| n > 0);
        self
    }

    pub fn rows(&self) -> usize {
        self.cells.len()
    }

    pub fn cols(&self) -> usize {
        self.cells.first().map_or(0, Vec::len)
    }

    fn role_at(&self, row: usize, col: usize, cell: &Cell) -> Role {
        if row < self.header_rows {
            Role::Top {
                highlight: col > 0 || !cell.is_blank(),
            }
        } else if col < self.header_cols {
            Role::Side
        } else {
            Role::Data {
                shaded: ((row - self.header_rows) / 3) & 1 == 1,
            }
        }
    }

    /// First row of every band: the body start and each page start.
    fn is_band_start(&self, row: usize) -> bool {
        if row == self.header_rows {
            return true;
        }
        match self.page_rows {
            Some(page) => row > self.header_rows && (row - self.header_rows) % page == 0,
            None => false,
        }
    }

    /// Computes the spans, row by row.
    pub fn layout(mut self) -> Layout {
        let rows = self.rows();
        let cols = self.cols();
        let (top, lft) = (self.header_rows, self.header_cols.min(cols));

        for c in 0..lft {
            let mut r = top;
            while r < rows {
                let mut i = r + 1;
                while i < rows && self.cells[r][c] == self.cells[i][c] {
                    self.cells[i][c] = Cell::Merge;
                    i += 1;
                }
                r = i;
            }
        }

        if rows > 0 && cols > 0 && self.cells[0][0].is_merge() {
            self.cells[0][0] = Cell::text("");
        }

        let mut covered = vec![vec![false; cols]; rows];
        let mut spans: Vec<Span> = Vec::new();

        for r in 0..rows {
            for c in 0..cols {
                if covered[r][c] {
                    continue;
                }
                if self.cells[r][c].is_merge() {
                    // nothing reached this marker; keep the row rectangular
                    covered[r][c] = true;
                    spans.push(Span {
                        row: r,
                        col: c,
                        width: 1,
                        height: 1,
                        role: self.role_at(r, c, &Cell::text("")),
                        cell: Cell::text(""),
                    });
                    continue;
                }

                let free = |y: usize, x: usize| {
                    y < rows && x < cols && self.cells[y][x].is_merge() && !covered[y][x]
                };
                let mut h = 1;
                while free(r + h, c) {
                    h += 1;
                }
                let mut w = 1;
                while free(r, c + w) {
                    w += 1;
                }
                for i in 0..h {
                    for k in 1..w {
                        if !free(r + i, c + k) {
                            w = w.min(k);
                            break;
                        }
                    }
                }

                for row in covered.iter_mut().skip(r).take(h) {
                    for slot in row.iter_mut().skip(c).take(w) {
                        *slot = true;
                    }
                }

                let cell = self.cells[r][c].clone();
                // split at band starts so no span crosses a repeated header
                let mut start = r;
                for y in r + 1..r + h {
                    if self.is_band_start(y) {
                        spans.push(Span {
                            row: start,
                            col: c,
                            width: w,
                            height: y - start,
                            role: self.role_at(start, c, &cell),
                            cell: cell.clone(),
                        });
                        start = y;
                    }
                }
                spans.push(Span {
                    row: start,
                    col: c,
                    width: w,
                    height: r + h - start,
                    role: self.role_at(start, c, &cell),
                    cell,
                });
            }
        }

        let mut by_row: Vec<Vec<Span>> = vec![Vec::new(); rows];
        for span in spans {
            by_row[span.row].push(span);
        }
        for row in by_row.iter_mut() {
            row.sort_by_key(|s| s.col);
        }

        Layout {
            rows: by_row,
            header_rows: top,
            page_rows: self.page_rows,
        }
    }
}

/// Spans grouped by the row they start in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub rows: Vec<Vec<Span>>,
    pub header_rows: usize,
    pub page_rows: Option<usize>,
}

impl Layout {
    fn render_row(out: &mut String, spans: &[Span]) {
        out.push_str("<tr>");
        for s in spans {
            let _ = match s.role {
                Role::Top { highlight } => write!(
                    out,
                    "<th{} colspan={} rowspan={}>{}</th>",
                    if highlight { " bgcolor=#ffffaa" } else { "" },
                    s.width,
                    s.height,
                    s.cell.label()
                ),
                Role::Side => write!(
                    out,
                    "<th bgcolor=#ddffff colspan={} rowspan={} align=left>{}</th>",
                    s.width,
                    s.height,
                    s.cell.label()
                ),
                Role::Data { shaded } => write!(
                    out,
                    "<td bgcolor={} colspan={} rowspan={} align=right>{}</td>",
                    if shaded { "#f0f0f0" } else { "#ffffff" },
                    s.width,
                    s.height,
                    s.cell.value()
                ),
            };
        }
        out.push_str("</tr>\n");
    }

    pub fn to_html(&self) -> String {
        let top = self.header_rows.min(self.rows.len());
        let mut header = String::new();
        for spans in &self.rows[..top] {
            Self::render_row(&mut header, spans);
        }

        let mut html = String::from("<table border=1>\n");
        html.push_str(&header);
        for (n, spans) in self.rows[top..].iter().enumerate() {
            if let Some(page) = self.page_rows {
                if n > 0 && n % page == 0 {
                    html.push_str(&header);
                }
            }
            Self::render_row(&mut html, spans);
        }
        html.push_str("</table>\n");
        html
    }
}

/// Lays out and renders in one step.
pub fn render(grid: Grid) -> String {
    grid.layout().to_html()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(s: &str) -> Cell {
        Cell::text(s)
    }

    fn shape(layout: &Layout) -> Vec<Vec<(usize, usize, usize)>> {
        layout
            .rows
            .iter()
            .map(|r| r.iter().map(|s| (s.col, s.width, s.height)).collect())
            .collect()
    }

    // -------------------------------------------------------------------------
    // Span growth
    // -------------------------------------------------------------------------

    #[test]
    fn test_rows_with_merge_markers_span_horizontally() {
        let grid = Grid::new(vec![vec![t("A"), Cell::Merge], vec![t("B"), Cell::Merge]], 0, 1);
        let layout = grid.layout();

        assert_eq!(shape(&layout), vec![vec![(0, 2, 1)], vec![(0, 2, 1)]]);
        assert_eq!(layout.rows[0][0].cell, t("A"));
        assert_eq!(layout.rows[1][0].cell, t("B"));
    }

    #[test]
    fn test_distinct_values_do_not_merge() {
        let grid = Grid::new(vec![vec![t("A"), t("A")], vec![t("B"), t("B")]], 0, 1);
        let layout = grid.layout();
        assert_eq!(shape(&layout), vec![vec![(0, 1, 1), (1, 1, 1)], vec![(0, 1, 1), (1, 1, 1)]]);
    }

    #[test]
    fn test_header_column_collapses_vertically() {
        let grid = Grid::new(
            vec![
                vec![t("cmd"), t("v")],
                vec![t("sh"), Cell::Number(1)],
                vec![t("sh"), Cell::Number(2)],
                vec![t("init"), Cell::Number(3)],
            ],
            1,
            1,
        );
        let layout = grid.layout();
        assert_eq!(
            shape(&layout),
            vec![vec![(0, 1, 1), (1, 1, 1)], vec![(0, 1, 2), (1, 1, 1)], vec![(1, 1, 1)], vec![(0, 1, 1), (1, 1, 1)]]
        );
        assert_eq!(layout.rows[1][0].role, Role::Side);
    }

    #[test]
    fn test_height_takes_priority_over_width() {
        // C grows two rows down; row 1 blocks its second column
        let grid = Grid::new(vec![vec![t("C"), Cell::Merge], vec![Cell::Merge, t("D")]], 0, 0);
        let layout = grid.layout();
        assert_eq!(shape(&layout), vec![vec![(0, 1, 2), (1, 1, 1)], vec![(1, 1, 1)]]);
        // the stranded marker is drawn as an empty cell
        assert_eq!(layout.rows[0][1].cell, t(""));
    }

    #[test]
    fn test_covered_cells_are_not_reused() {
        let grid = Grid::new(
            vec![
                vec![t("A"), t("B")],
                vec![t("C"), Cell::Merge],
                vec![Cell::Merge, t("D")],
            ],
            0,
            0,
        );
        let layout = grid.layout();
        assert_eq!(shape(&layout), vec![vec![(0, 1, 1), (1, 1, 2)], vec![(0, 1, 2)], vec![(1, 1, 1)]]);
    }

    #[test]
    fn test_corner_marker_becomes_blank_header() {
        let grid = Grid::new(vec![vec![Cell::Merge, t("x")], vec![t("r"), Cell::Number(1)]], 1, 1);
        let layout = grid.layout();
        let corner = &layout.rows[0][0];
        assert_eq!(corner.cell, t(""));
        assert_eq!(corner.role, Role::Top { highlight: false });
        assert_eq!(layout.rows[0][1].role, Role::Top { highlight: true });
    }

    // -------------------------------------------------------------------------
    // Rendering
    // -------------------------------------------------------------------------

    #[test]
    fn test_data_cells_banded_and_zero_hidden() {
        let mut cells = vec![vec![t("k"), t("v")]];
        for i in 0..7u64 {
            cells.push(vec![t(&format!("r{}", i)), i.into()]);
        }
        let layout = Grid::new(cells, 1, 1).layout();

        let data: Vec<Role> = layout.rows[1..].iter().map(|r| r[1].role).collect();
        let shaded: Vec<bool> = data
            .iter()
            .map(|r| matches!(r, Role::Data { shaded: true }))
            .collect();
        assert_eq!(shaded, vec![false, false, false, true, true, true, false]);

        let html = layout.to_html();
        assert!(html.contains("<td bgcolor=#ffffff colspan=1 rowspan=1 align=right>-</td>"));
        assert!(html.contains("<th bgcolor=#ddffff colspan=1 rowspan=1 align=left>r0</th>"));
    }

    #[test]
    fn test_text_is_escaped_but_markup_is_not() {
        let grid = Grid::new(vec![vec![t("a<b"), Cell::html("<a href=\"x\">x</a>")]], 1, 0);
        let html = render(grid);
        assert!(html.contains("a&lt;b"));
        assert!(html.contains("<a href=\"x\">x</a>"));
    }

    #[test]
    fn test_pagination_repeats_header_and_splits_spans() {
        let mut cells = vec![vec![t("cmd"), t("v")]];
        for i in 1..=5u64 {
            cells.push(vec![t("same"), i.into()]);
        }
        let layout = Grid::new(cells, 1, 1).paginate(Some(2)).layout();

        // the collapsed "same" column restarts on every page
        let side: Vec<(usize, usize)> = layout
            .rows
            .iter()
            .flatten()
            .filter(|s| s.role == Role::Side)
            .map(|s| (s.row, s.height))
            .collect();
        assert_eq!(side, vec![(1, 2), (3, 2), (5, 1)]);

        let html = layout.to_html();
        assert_eq!(html.matches(">cmd</th>").count(), 3);
    }

    #[test]
    fn test_slice_rows() {
        assert_eq!(slice_rows(0, 20), None);
        assert_eq!(slice_rows(10, 0), None);
        assert_eq!(slice_rows(10, 20), Some(10));
        assert_eq!(slice_rows(21, 20), Some(11));
        assert_eq!(slice_rows(45, 20), Some(15));
    }
}
