//! Multi-snapshot diff engine.
//!
//! Every snapshot becomes a five level tree
//! `system → command → pid → type → path`, each node summing the mappings
//! below it. The trees are walked in lock step over the union of their keys,
//! emitting one row per node at the requested depth and metric, ranked by
//! the spread of the per-snapshot values around their median.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;

use crate::error::{SmapsError, SmapsResult};
use crate::ingest::Snapshot;
use crate::model::Mapping;
use crate::stats::{CowPolicy, MemRow};

/// Depth of the diff tree a report is generated at.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum DiffLevel {
    System = 0,
    Command = 1,
    Pid = 2,
    #[default]
    Type = 3,
    Path = 4,
}

impl DiffLevel {
    pub const ALL: [DiffLevel; 5] = [
        DiffLevel::System,
        DiffLevel::Command,
        DiffLevel::Pid,
        DiffLevel::Type,
        DiffLevel::Path,
    ];

    /// Clamps to the valid range.
    pub fn from_index(level: i64) -> Self {
        Self::ALL[level.clamp(0, 4) as usize]
    }

    pub fn index(self) -> usize {
        self as usize
    }

    /// Column label of the key introduced at this level.
    pub fn label(self) -> &'static str {
        match self {
            DiffLevel::System => "Sys",
            DiffLevel::Command => "Cmd",
            DiffLevel::Pid => "Pid",
            DiffLevel::Type => "Type",
            DiffLevel::Path => "Path",
        }
    }

    /// Level implied by an output file name such as `boot.pid.csv`: the
    /// dotted components are scanned right to left for
    /// `sys`, `app`, `pid`, `sec` or `obj`.
    pub fn from_file_name(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?;
        name.rsplit('.').find_map(|part| match part {
            "sys" => Some(DiffLevel::System),
            "app" => Some(DiffLevel::Command),
            "pid" => Some(DiffLevel::Pid),
            "sec" => Some(DiffLevel::Type),
            "obj" => Some(DiffLevel::Path),
            _ => None,
        })
    }
}

/// Output format of a diff report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffMode {
    Csv,
    Html,
}

impl DiffMode {
    pub fn from_name(name: &str) -> SmapsResult<Self> {
        match name.trim_start_matches('.') {
            "csv" => Ok(DiffMode::Csv),
            "html" => Ok(DiffMode::Html),
            other => Err(SmapsError::UnknownMode(other.to_string())),
        }
    }

    /// Explicit mode, else the output extension, else CSV.
    pub fn resolve(mode: Option<&str>, output: Option<&Path>) -> SmapsResult<Self> {
        if let Some(mode) = mode {
            return Self::from_name(mode);
        }
        match output {
            Some(path) => Self::from_name(&path.extension().map(|e| e.to_string_lossy()).unwrap_or_default()),
            None => Ok(DiffMode::Csv),
        }
    }

    /// Blanking repeated keys is the default for HTML only.
    pub fn filtered_by_default(self) -> bool {
        matches!(self, DiffMode::Html)
    }
}

/// The metrics compared by a diff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Private,
    Shared,
    Clean,
}

impl Metric {
    pub const ALL: [Metric; 3] = [Metric::Private, Metric::Shared, Metric::Clean];

    pub fn label(self) -> &'static str {
        match self {
            Metric::Private => "pri",
            Metric::Shared => "sha",
            Metric::Clean => "cln",
        }
    }

    pub fn of(self, row: &MemRow) -> u64 {
        match self {
            Metric::Private => row.private,
            Metric::Shared => row.shared,
            Metric::Clean => row.clean,
        }
    }
}

/// Child key of a diff node. Pids are renumbered per command, so they sort
/// numerically.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DiffKey {
    Text(String),
    Index(u32),
}

impl fmt::Display for DiffKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiffKey::Text(s) => f.write_str(s),
            DiffKey::Index(n) => write!(f, "{}", n),
        }
    }
}

/// One node of a snapshot's diff tree.
#[derive(Debug, Clone)]
pub struct DiffNode<'a> {
    pub level: DiffLevel,
    pub key: DiffKey,
    pub maps: Vec<&'a Mapping>,
    pub children: BTreeMap<DiffKey, DiffNode<'a>>,
    pub totals: MemRow,
}

fn partition<'a, K, F>(maps: &[&'a Mapping], key: F) -> BTreeMap<K, Vec<&'a Mapping>>
where
    K: Ord,
    F: Fn(&Mapping) -> K,
{
    let mut out: BTreeMap<K, Vec<&'a Mapping>> = BTreeMap::new();
    for &m in maps {
        out.entry(key(m)).or_default().push(m);
    }
    out
}

impl<'a> DiffNode<'a> {
    fn new(level: DiffLevel, key: DiffKey, maps: Vec<&'a Mapping>) -> Self {
        Self {
            level,
            key,
            maps,
            children: BTreeMap::new(),
            totals: MemRow::default(),
        }
    }

    fn add_children<K, F>(&mut self, level: DiffLevel, key: F, wrap: fn(K) -> DiffKey)
    where
        K: Ord,
        F: Fn(&Mapping) -> K,
    {
        for (k, maps) in partition(&self.maps, key) {
            let k = wrap(k);
            self.children.insert(k.clone(), DiffNode::new(level, k, maps));
        }
    }

    /// Builds the tree of one snapshot. Mappings of excluded commands are
    /// left out entirely.
    pub fn build(maps: &'a [Mapping], exclude: &[String]) -> Self {
        let kept: Vec<&Mapping> = maps.iter().filter(|m| !exclude.contains(&m.name)).collect();
        let mut root = DiffNode::new(DiffLevel::System, DiffKey::Text("sys".into()), kept);

        root.add_children(DiffLevel::Command, |m| m.name.clone(), DiffKey::Text);
        for app in root.children.values_mut() {
            // 1..n in pid order, comparable across snapshots
            let pids: BTreeSet<u32> = app.maps.iter().map(|m| m.pid).collect();
            let index: BTreeMap<u32, u32> = pids.into_iter().zip(1..).collect();
            app.add_children(DiffLevel::Pid, |m| index.get(&m.pid).copied().unwrap_or(0), DiffKey::Index);

            for pid in app.children.values_mut() {
                pid.add_children(DiffLevel::Type, |m| m.category.clone(), DiffKey::Text);
                for sec in pid.children.values_mut() {
                    sec.add_children(DiffLevel::Path, |m| m.path.clone(), DiffKey::Text);
                }
            }
        }
        root
    }

    /// Recomputes the totals of this node and all descendants from their
    /// own mappings. Idempotent.
    pub fn scan(&mut self, policy: CowPolicy) {
        let mut totals = MemRow::default();
        for m in &self.maps {
            totals.accumulate(&MemRow::from_mapping(m, policy));
        }
        self.totals = totals;
        for child in self.children.values_mut() {
            child.scan(policy);
        }
    }
}

/// Median of `values`; the mean of the two middle values for even counts.
pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut v = values.to_vec();
    v.sort_by(|a, b| a.total_cmp(b));
    let n = v.len();
    (v[(n - 1) / 2] + v[n / 2]) * 0.5
}

/// Spread of `values` around their median: `sqrt(mean((x - median)^2))`.
pub fn rank(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = median(values);
    let sum: f64 = values.iter().map(|x| (x - m).powi(2)).sum();
    (sum / values.len() as f64).sqrt()
}

/// One output row: a node key path, a metric, and one value per snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct DiffRow {
    /// Keys from the command level down to the report level.
    pub keys: Vec<String>,
    pub metric: Metric,
    /// `None` where the node does not exist in that snapshot.
    pub values: Vec<Option<u64>>,
    pub rank: f64,
}

fn collect_rows(nodes: &[Option<&DiffNode<'_>>], keys: &mut Vec<String>, level: DiffLevel, out: &mut Vec<DiffRow>) {
    let depth = keys.len();
    if depth >= level.index() {
        for metric in Metric::ALL {
            let values: Vec<Option<u64>> = nodes.iter().map(|n| n.map(|n| metric.of(&n.totals))).collect();
            let numbers: Vec<f64> = values.iter().map(|v| v.unwrap_or(0) as f64).collect();
            out.push(DiffRow {
                keys: keys.clone(),
                metric,
                values,
                rank: rank(&numbers),
            });
        }
        return;
    }

    let union: BTreeSet<&DiffKey> = nodes.iter().flatten().flat_map(|n| n.children.keys()).collect();
    for key in union {
        let next: Vec<Option<&DiffNode<'_>>> = nodes
            .iter()
            .map(|n| n.and_then(|n| n.children.get(key)))
            .collect();
        keys.push(key.to_string());
        collect_rows(&next, keys, level, out);
        keys.pop();
    }
}

/// Every (node, metric) row at `level` over the given trees, unfiltered.
pub fn diff_rows(roots: &[DiffNode<'_>], level: DiffLevel) -> Vec<DiffRow> {
    let nodes: Vec<Option<&DiffNode<'_>>> = roots.iter().map(Some).collect();
    let mut rows = Vec::new();
    collect_rows(&nodes, &mut Vec::new(), level, &mut rows);
    rows
}

/// Diff parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct DiffOptions {
    pub level: DiffLevel,
    pub min_rank: f64,
    pub exclude_commands: Vec<String>,
    pub cow_policy: CowPolicy,
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self {
            level: DiffLevel::default(),
            min_rank: 4.0,
            exclude_commands: Vec::new(),
            cow_policy: CowPolicy::default(),
        }
    }
}

/// Ranked, filtered diff of a list of snapshots.
#[derive(Debug, Clone)]
pub struct DiffReport {
    pub level: DiffLevel,
    pub sources: Vec<String>,
    pub rows: Vec<DiffRow>,
}

pub fn diff(snapshots: &[Snapshot], opts: &DiffOptions) -> DiffReport {
    let mut roots: Vec<DiffNode<'_>> = snapshots
        .iter()
        .map(|s| DiffNode::build(&s.maps, &opts.exclude_commands))
        .collect();
    for root in roots.iter_mut() {
        root.scan(opts.cow_policy);
    }

    let rows = diff_rows(&roots, opts.level)
        .into_iter()
        .filter(|r| r.rank >= opts.min_rank)
        .collect();

    DiffReport {
        level: opts.level,
        sources: snapshots.iter().map(|s| s.source.display().to_string()).collect(),
        rows,
    }
}

impl DiffReport {
    pub fn header(&self) -> Vec<String> {
        let mut header: Vec<String> = DiffLevel::ALL[1..=self.level.index()]
            .iter()
            .map(|l| l.label().to_string())
            .collect();
        header.push("Value".to_string());
        header.extend((1..=self.sources.len()).map(|i| format!("CAP{}", i)));
        header.push("RANK".to_string());
        header
    }

    fn render_row(row: &DiffRow) -> Vec<String> {
        let mut cells = row.keys.clone();
        cells.push(row.metric.label().to_string());
        cells.extend(
            row.values
                .iter()
                .map(|v| v.map_or_else(|| "n/a".to_string(), |v| v.to_string())),
        );
        cells.push(format!("{:.2}", row.rank));
        cells
    }

    /// Header plus data rows as display strings.
    ///
    /// With `filtered`, leading key columns equal to the previous row are
    /// blanked and a blank separator row precedes every command change.
    /// Only the rendered copy changes; the rows themselves are untouched.
    pub fn table(&self, filtered: bool) -> Vec<Vec<String>> {
        let mut out = vec![self.header()];
        let keys = self.level.index();

        let mut prev: Option<&DiffRow> = None;
        for row in &self.rows {
            let mut cells = Self::render_row(row);
            if let (true, Some(prev)) = (filtered, prev) {
                for c in 0..keys {
                    if prev.keys[c] == row.keys[c] {
                        cells[c].clear();
                    } else {
                        if c == 0 {
                            out.push(vec![String::new(); cells.len()]);
                        }
                        break;
                    }
                }
            }
            out.push(cells);
            prev = Some(row);
        }
        out
    }
}
