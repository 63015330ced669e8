//! Aggregation engine: per-application and per-object statistic tables and
//! the three system wide summaries built from them.
//!
//! | table          | built from      | fold                               |
//! |----------------|-----------------|------------------------------------|
//! | application    | its mappings    | sum                                |
//! | object         | its mappings    | sum private, max everything else   |
//! | `sys_max`      | app tables      | sum                                |
//! | `sys_estimate` | object tables   | sum, then rss = pri + sha + cln    |
//! | `app_max`      | app tables      | max per metric                     |

use std::cmp::Reverse;

use ahash::AHashMap as HashMap;
use serde::{Deserialize, Serialize};

use crate::model::{CategoryCatalog, Mapping};

/// How the copy-on-write metric of a mapping is obtained when folding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CowPolicy {
    /// Use the value stored on the mapping.
    #[default]
    Recorded,
    /// Shared pages of private writable mappings.
    SharedWritable,
}

impl CowPolicy {
    pub fn cow_of(self, m: &Mapping) -> u64 {
        match self {
            CowPolicy::Recorded => m.cow,
            CowPolicy::SharedWritable if m.is_private_writable() => m.shared_clean + m.shared_dirty,
            CowPolicy::SharedWritable => 0,
        }
    }
}

/// The six memory metrics, in kB.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MemRow {
    pub private: u64,
    pub shared: u64,
    pub clean: u64,
    pub resident: u64,
    pub size: u64,
    pub cow: u64,
}

impl MemRow {
    pub const LABELS: [&'static str; 6] = ["pri", "sha", "cln", "rss", "size", "cow"];

    pub fn from_mapping(m: &Mapping, policy: CowPolicy) -> Self {
        Self {
            private: m.private,
            shared: m.shared,
            clean: m.clean,
            resident: m.resident,
            size: m.size,
            cow: policy.cow_of(m),
        }
    }

    /// Metrics in sort priority order.
    pub fn vector(&self) -> [u64; 6] {
        [self.private, self.shared, self.clean, self.resident, self.size, self.cow]
    }

    pub fn is_nonzero(&self) -> bool {
        self.vector().iter().any(|&v| v != 0)
    }

    pub fn accumulate(&mut self, other: &MemRow) {
        self.private += other.private;
        self.shared += other.shared;
        self.clean += other.clean;
        self.resident += other.resident;
        self.size += other.size;
        self.cow += other.cow;
    }

    /// Object fold: private pages add up per mapper, the rest is one
    /// shared resource.
    pub fn fold_object(&mut self, other: &MemRow) {
        self.private += other.private;
        self.shared = self.shared.max(other.shared);
        self.clean = self.clean.max(other.clean);
        self.resident = self.resident.max(other.resident);
        self.size = self.size.max(other.size);
        self.cow = self.cow.max(other.cow);
    }

    pub fn maximum(&mut self, other: &MemRow) {
        self.private = self.private.max(other.private);
        self.shared = self.shared.max(other.shared);
        self.clean = self.clean.max(other.clean);
        self.resident = self.resident.max(other.resident);
        self.size = self.size.max(other.size);
        self.cow = self.cow.max(other.cow);
    }
}

/// Category x metric table. Row `i` belongs to category `i` of the run's
/// [`CategoryCatalog`]; row 0 is the total.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatTable {
    rows: Vec<MemRow>,
}

impl StatTable {
    pub fn new(catalog: &CategoryCatalog) -> Self {
        Self {
            rows: vec![MemRow::default(); catalog.len()],
        }
    }

    pub fn rows(&self) -> &[MemRow] {
        &self.rows
    }

    pub fn row(&self, index: usize) -> &MemRow {
        &self.rows[index]
    }

    pub fn row_mut(&mut self, index: usize) -> &mut MemRow {
        &mut self.rows[index]
    }

    pub fn total(&self) -> &MemRow {
        &self.rows[0]
    }

    /// Sets the total row to the sum of all other rows. Never implicit:
    /// call after populating rows.
    pub fn recompute_total(&mut self) {
        let mut total = MemRow::default();
        for row in &self.rows[1..] {
            total.accumulate(row);
        }
        self.rows[0] = total;
    }

    /// Column of one metric over all categories.
    pub fn column(&self, metric: fn(&MemRow) -> u64) -> Vec<u64> {
        self.rows.iter().map(metric).collect()
    }
}

/// Mappings sharing one key, with their folded statistics.
#[derive(Debug, Clone)]
pub struct Group<K> {
    pub key: K,
    /// Stable page id, `app000` / `obj000` in first-seen order.
    pub id: String,
    /// Indices into [`Aggregation::maps`].
    pub members: Vec<usize>,
    pub table: StatTable,
}

/// Application group, keyed by pid.
pub type AppGroup = Group<u32>;
/// Object group, keyed by backing path.
pub type ObjGroup = Group<String>;

/// Everything the reports need from one snapshot.
#[derive(Debug, Clone)]
pub struct Aggregation {
    pub catalog: CategoryCatalog,
    pub maps: Vec<Mapping>,
    /// Heaviest first.
    pub apps: Vec<AppGroup>,
    /// Heaviest first.
    pub objects: Vec<ObjGroup>,
    pub sys_estimate: StatTable,
    pub sys_max: StatTable,
    pub app_max: StatTable,
}

/// Groups mappings by `key` in first-seen order and folds each group into
/// a fresh table.
fn build_groups<K, F>(
    maps: &[Mapping],
    catalog: &CategoryCatalog,
    prefix: &str,
    key: F,
    policy: CowPolicy,
    fold: fn(&mut MemRow, &MemRow),
) -> Vec<Group<K>>
where
    K: Clone + Eq + std::hash::Hash,
    F: Fn(&Mapping) -> K,
{
    let mut index: HashMap<K, usize> = HashMap::new();
    let mut groups: Vec<(K, Vec<usize>)> = Vec::new();
    for (i, m) in maps.iter().enumerate() {
        let k = key(m);
        let slot = *index.entry(k.clone()).or_insert_with(|| {
            groups.push((k, Vec::new()));
            groups.len() - 1
        });
        groups[slot].1.push(i);
    }

    groups
        .into_iter()
        .enumerate()
        .map(|(n, (key, members))| {
            let mut table = StatTable::new(catalog);
            for &i in &members {
                let m = &maps[i];
                if let Some(row) = catalog.index_of(&m.category) {
                    fold(table.row_mut(row), &MemRow::from_mapping(m, policy));
                }
            }
            table.recompute_total();
            Group {
                key,
                id: format!("{}{:03}", prefix, n),
                members,
                table,
            }
        })
        .collect()
}

/// Descending by the total vector. Stable, so ties keep first-seen order.
fn sort_heaviest_first<K>(groups: &mut [Group<K>]) {
    groups.sort_by_key(|g| Reverse(g.table.total().vector()));
}

impl Aggregation {
    pub fn new(maps: Vec<Mapping>, policy: CowPolicy) -> Self {
        let catalog = CategoryCatalog::from_mappings(&maps);

        let mut apps = build_groups(&maps, &catalog, "app", |m| m.pid, policy, MemRow::accumulate);
        let mut objects = build_groups(&maps, &catalog, "obj", |m| m.path.clone(), policy, MemRow::fold_object);

        sort_heaviest_first(&mut apps);
        sort_heaviest_first(&mut objects);

        // max over every row, total included; the total is not re-summed
        let mut app_max = StatTable::new(&catalog);
        for g in &apps {
            for (dst, src) in app_max.rows.iter_mut().zip(g.table.rows()) {
                dst.maximum(src);
            }
        }

        let mut sys_max = StatTable::new(&catalog);
        for g in &apps {
            for (dst, src) in sys_max.rows.iter_mut().zip(g.table.rows()) {
                dst.accumulate(src);
            }
        }
        sys_max.recompute_total();

        let mut sys_estimate = StatTable::new(&catalog);
        for g in &objects {
            for (dst, src) in sys_estimate.rows.iter_mut().zip(g.table.rows()) {
                dst.accumulate(src);
            }
        }
        for row in sys_estimate.rows.iter_mut() {
            row.resident = row.private + row.shared + row.clean;
        }
        sys_estimate.recompute_total();

        Self {
            catalog,
            maps,
            apps,
            objects,
            sys_estimate,
            sys_max,
            app_max,
        }
    }

    pub fn members<'a, K>(&'a self, group: &'a Group<K>) -> impl Iterator<Item = &'a Mapping> + 'a {
        group.members.iter().map(move |&i| &self.maps[i])
    }

    /// Representative mapping of an application group.
    pub fn first<K>(&self, group: &Group<K>) -> Option<&Mapping> {
        group.members.first().map(|&i| &self.maps[i])
    }

    pub fn app_by_pid(&self, pid: u32) -> Option<&AppGroup> {
        self.apps.iter().find(|g| g.key == pid)
    }

    pub fn object_by_path(&self, path: &str) -> Option<&ObjGroup> {
        self.objects.iter().find(|g| g.key == path)
    }
}
