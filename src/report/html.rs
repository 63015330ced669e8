//! HTML report: a navigation page plus one page per application and per
//! backing object, stored under `<stem>.dir/` next to the navigation page.

use std::fs;
use std::path::{Path, PathBuf};

use ahash::AHashMap as HashMap;
use rayon::prelude::*;

use crate::diagnostics::Diagnostics;
use crate::error::{SmapsError, SmapsResult};
use crate::model::{CategoryCatalog, Mapping};
use crate::report::{page_footer, page_header, relative_link, write_file};
use crate::stats::{AppGroup, Aggregation, ObjGroup, StatTable};
use crate::table::{escape_html, render, slice_rows, Cell, Grid};

/// Locations of the report files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportPaths {
    pub navigation: PathBuf,
    pub data_dir: PathBuf,
}

impl ReportPaths {
    pub fn for_output(navigation: &Path) -> Self {
        Self {
            navigation: navigation.to_path_buf(),
            data_dir: navigation.with_extension("dir"),
        }
    }

    pub fn page(&self, id: &str) -> PathBuf {
        self.data_dir.join(format!("{}.html", id))
    }
}

/// Page ids by group key, for cross links.
#[derive(Debug)]
pub struct PageIndex<'a> {
    apps: HashMap<u32, &'a str>,
    objects: HashMap<&'a str, &'a str>,
}

impl<'a> PageIndex<'a> {
    pub fn new(agg: &'a Aggregation) -> Self {
        Self {
            apps: agg.apps.iter().map(|g| (g.key, g.id.as_str())).collect(),
            objects: agg.objects.iter().map(|g| (g.key.as_str(), g.id.as_str())).collect(),
        }
    }

    fn app_link(&self, paths: &ReportPaths, from: &Path, pid: u32, text: &str) -> String {
        match self.apps.get(&pid) {
            Some(id) => anchor(&relative_link(&paths.page(id), from), text),
            None => escape_html(text),
        }
    }

    fn object_link(&self, paths: &ReportPaths, from: &Path, path: &str, text: &str) -> String {
        match self.objects.get(path) {
            Some(id) => anchor(&relative_link(&paths.page(id), from), text),
            None => escape_html(text),
        }
    }
}

fn anchor(href: &str, text: &str) -> String {
    format!(r#"<a href="{}">{}</a>"#, escape_html(href), escape_html(text))
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Category x metric table with a two row header.
pub fn stat_table(table: &StatTable, catalog: &CategoryCatalog) -> String {
    let mut cells = vec![
        vec![
            Cell::text(""),
            Cell::text("Dirty"),
            Cell::Merge,
            Cell::text("Clean"),
            Cell::text("Resident"),
            Cell::text("Size"),
            Cell::text("COW"),
        ],
        vec![
            Cell::Merge,
            Cell::text("Private"),
            Cell::text("Shared"),
            Cell::Merge,
            Cell::Merge,
            Cell::Merge,
            Cell::Merge,
        ],
    ];
    for (name, row) in catalog.names().iter().zip(table.rows()) {
        let mut line = vec![Cell::text(name.as_str())];
        line.extend(row.vector().into_iter().map(Cell::Number));
        cells.push(line);
    }
    render(Grid::new(cells, 2, 1))
}

/// Header rows shared by the application and object value tables.
fn values_header(first: &str, catalog: &CategoryCatalog) -> Vec<Vec<Cell>> {
    let classes = catalog.classes();

    let mut top = vec![
        Cell::text(first),
        Cell::text("RSS / Status"),
        Cell::Merge,
        Cell::Merge,
        Cell::html("Virtual<br>Memory"),
        Cell::Merge,
        Cell::html("RSS<br>COW<br>Est."),
    ];
    top.push(Cell::text("RSS / Class"));
    top.extend(classes.iter().skip(1).map(|_| Cell::Merge));

    let mut mid = vec![
        Cell::Merge,
        Cell::text("Dirty"),
        Cell::Merge,
        Cell::text("Clean"),
        Cell::Merge,
        Cell::Merge,
        Cell::Merge,
    ];
    mid.extend(classes.iter().map(|c| Cell::text(capitalize(c))));

    let mut low = vec![
        Cell::Merge,
        Cell::text("Private"),
        Cell::text("Shared"),
        Cell::Merge,
        Cell::text("RSS"),
        Cell::text("Size"),
        Cell::Merge,
    ];
    low.extend(classes.iter().map(|_| Cell::Merge));

    vec![top, mid, low]
}

fn values_row(label: String, table: &StatTable) -> Vec<Cell> {
    let mut row = vec![Cell::html(label)];
    row.extend(table.total().vector().into_iter().map(Cell::Number));
    row.extend(table.rows()[1..].iter().map(|r| Cell::Number(r.resident)));
    row
}

fn values_table(cells: Vec<Vec<Cell>>, page_rows: usize) -> String {
    let data_rows = cells.len().saturating_sub(3);
    render(Grid::new(cells, 3, 1).paginate(slice_rows(data_rows, page_rows)))
}

/// One entry of the process hierarchy list, with its children.
fn hierarchy(
    out: &mut String,
    agg: &Aggregation,
    index: &PageIndex<'_>,
    paths: &ReportPaths,
    node: usize,
    children: &[Vec<usize>],
    emitted: &mut [bool],
) {
    if emitted[node] {
        return;
    }
    emitted[node] = true;
    let group = &agg.apps[node];
    let Some(app) = agg.first(group) else {
        return;
    };
    let text = format!("{} ({})", app.name, app.pid);
    out.push_str(&format!("<li>{}", index.app_link(paths, &paths.navigation, group.key, &text)));
    if !children[node].is_empty() {
        out.push_str("\n<ul>\n");
        for &child in &children[node] {
            hierarchy(out, agg, index, paths, child, children, emitted);
        }
        out.push_str("</ul>");
    }
    out.push_str("</li>\n");
}

/// The navigation page.
pub fn render_navigation(agg: &Aggregation, index: &PageIndex<'_>, paths: &ReportPaths, page_rows: usize) -> String {
    let nav = &paths.navigation;
    let mut html = page_header("SMAPS DATA");

    html.push_str("<h1>System Estimates</h1>\n");
    for (title, table, caveat) in [
        (
            "System: Memory Use Estimate",
            &agg.sys_estimate,
            "Private and Size are accurate, the rest are minimums.",
        ),
        (
            "System: Memory Use App Totals",
            &agg.sys_max,
            "Private is accurate, the rest are maximums.",
        ),
        (
            "System: Memory Use App Maximums",
            &agg.app_max,
            "No process has values larger than the ones listed above.",
        ),
    ] {
        html.push_str(&format!("<h2>{}</h2>\n", title));
        html.push_str(&stat_table(table, &agg.catalog));
        html.push_str(&format!("<p class=\"caveat\">{}</p>\n", caveat));
    }

    // process tree from the pid/ppid of each application
    html.push_str("<h1>Process Hierarchy</h1>\n");
    let slot: HashMap<u32, usize> = agg.apps.iter().enumerate().map(|(i, g)| (g.key, i)).collect();
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); agg.apps.len()];
    let mut roots = Vec::new();
    for (i, g) in agg.apps.iter().enumerate() {
        let parent = agg
            .first(g)
            .and_then(|m| slot.get(&m.ppid))
            .copied()
            .filter(|&p| p != i);
        match parent {
            Some(p) => children[p].push(i),
            None => roots.push(i),
        }
    }
    if !agg.apps.is_empty() {
        let mut emitted = vec![false; agg.apps.len()];
        html.push_str("<ul>\n");
        for root in roots {
            hierarchy(&mut html, agg, index, paths, root, &children, &mut emitted);
        }
        // members of a ppid cycle have no root above them
        for i in 0..agg.apps.len() {
            if !emitted[i] {
                hierarchy(&mut html, agg, index, paths, i, &children, &mut emitted);
            }
        }
        html.push_str("</ul>\n");
    }

    html.push_str("<h1>Application Values</h1>\n");
    let mut cells = values_header("Application", &agg.catalog);
    for g in &agg.apps {
        let Some(app) = agg.first(g) else { continue };
        let link = index.app_link(paths, nav, g.key, &format!("{} {}", app.name, app.pid));
        cells.push(values_row(link, &g.table));
    }
    html.push_str(&values_table(cells, page_rows));

    html.push_str("<h1>Object Values</h1>\n");
    let mut cells = values_header("Object", &agg.catalog);
    for g in &agg.objects {
        let Some(obj) = agg.first(g) else { continue };
        let link = index.object_link(paths, nav, &g.key, &obj.file);
        cells.push(values_row(link, &g.table));
    }
    html.push_str(&values_table(cells, page_rows));

    html.push_str(&page_footer());
    html
}

fn xref_header(first: &str) -> Vec<Vec<Cell>> {
    let mut top: Vec<Cell> = [first, "Type", "Prot", "Size", "Rss", "Dirty"]
        .into_iter()
        .map(Cell::text)
        .collect();
    top.extend([Cell::Merge, Cell::text("Clean"), Cell::Merge]);

    let mut low = vec![Cell::Merge; 5];
    low.extend(["Private", "Shared", "Private", "Shared"].into_iter().map(Cell::text));
    vec![top, low]
}

fn xref_row(link: String, m: &Mapping) -> Vec<Cell> {
    vec![
        Cell::html(link),
        Cell::text(m.category.as_str()),
        Cell::text(m.prot.as_str()),
        Cell::Number(m.size),
        Cell::Number(m.resident),
        Cell::Number(m.private_dirty),
        Cell::Number(m.shared_dirty),
        Cell::Number(m.private_clean),
        Cell::Number(m.shared_clean),
    ]
}

/// Page of one application: its table and the objects it maps.
pub fn render_app_page(agg: &Aggregation, index: &PageIndex<'_>, paths: &ReportPaths, group: &AppGroup) -> String {
    let page = paths.page(&group.id);
    let (name, pid) = agg.first(group).map_or(("", group.key), |m| (m.name.as_str(), m.pid));
    let title = format!("Application: {} ({})", name, pid);

    let mut html = page_header(&title);
    html.push_str(&format!("<h1>{}</h1>\n", escape_html(&title)));
    html.push_str(&stat_table(&group.table, &agg.catalog));

    html.push_str("<h1>Mapping XREF</h1>\n");
    let mut maps: Vec<&Mapping> = agg.members(group).collect();
    maps.sort_by_cached_key(|m| (m.file.to_lowercase(), m.path.to_lowercase(), m.category.clone()));

    let mut cells = xref_header("Object");
    for m in maps {
        let file = Path::new(&m.path)
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_else(|| m.path.clone());
        cells.push(xref_row(index.object_link(paths, &page, &m.path, &file), m));
    }
    html.push_str(&render(Grid::new(cells, 2, 1)));

    html.push_str(&page_footer());
    html
}

/// Page of one backing object: its table and the applications mapping it.
pub fn render_object_page(agg: &Aggregation, index: &PageIndex<'_>, paths: &ReportPaths, group: &ObjGroup) -> String {
    let page = paths.page(&group.id);
    let title = format!("Object: {}", group.key);

    let mut html = page_header(&title);
    html.push_str(&format!("<h1>{}</h1>\n", escape_html(&title)));
    html.push_str(&stat_table(&group.table, &agg.catalog));

    html.push_str("<h1>Application XREF</h1>\n");
    let mut maps: Vec<&Mapping> = agg.members(group).collect();
    // writable mappings first within a type
    maps.sort_by_cached_key(|m| (m.name.to_lowercase(), m.pid, m.category.clone(), !m.prot.contains('w')));

    let mut cells = xref_header("Object");
    for m in maps {
        let text = format!("{} ({})", m.name, m.pid);
        cells.push(xref_row(index.app_link(paths, &page, m.pid, &text), m));
    }
    html.push_str(&render(Grid::new(cells, 2, 1)));

    html.push_str(&page_footer());
    html
}

/// Writes the navigation page and all sub-pages.
pub fn save_html_report(
    agg: &Aggregation,
    navigation: &Path,
    page_rows: usize,
    diag: &Diagnostics,
) -> SmapsResult<ReportPaths> {
    let paths = ReportPaths::for_output(navigation);
    fs::create_dir_all(&paths.data_dir).map_err(|e| SmapsError::io(&paths.data_dir, e))?;

    let index = PageIndex::new(agg);
    write_file(&paths.navigation, &render_navigation(agg, &index, &paths, page_rows), diag)?;

    agg.apps.par_iter().try_for_each(|g| {
        write_file(&paths.page(&g.id), &render_app_page(agg, &index, &paths, g), diag)
    })?;
    agg.objects.par_iter().try_for_each(|g| {
        write_file(&paths.page(&g.id), &render_object_page(agg, &index, &paths, g), diag)
    })?;

    diag.debug(&format!(
        "{}: {} application and {} object pages",
        paths.navigation.display(),
        agg.apps.len(),
        agg.objects.len()
    ));
    Ok(paths)
}
