//! Per-application summary CSV.

use std::fs;
use std::io::Write;
use std::path::Path;

use crate::diagnostics::Diagnostics;
use crate::error::{SmapsError, SmapsResult};
use crate::ingest::{generator, to_csv};
use crate::stats::{Aggregation, MemRow};

/// One row per application in aggregation order: owner fields, the total
/// metrics, then the resident size of every category except the total.
pub fn write_appvals<W: Write>(out: &mut W, agg: &Aggregation) -> std::io::Result<()> {
    writeln!(out, "generator = {}", generator())?;
    writeln!(out)?;

    let mut labels: Vec<&str> = vec!["name", "pid", "ppid", "threads"];
    labels.extend(MemRow::LABELS);
    labels.extend(agg.catalog.classes().iter().map(String::as_str));
    writeln!(out, "{}", labels.join(","))?;

    for group in &agg.apps {
        let Some(app) = agg.first(group) else { continue };
        let mut row = vec![
            to_csv(&app.name),
            app.pid.to_string(),
            app.ppid.to_string(),
            app.threads.to_string(),
        ];
        row.extend(group.table.total().vector().iter().map(u64::to_string));
        row.extend(group.table.rows()[1..].iter().map(|r| r.resident.to_string()));
        writeln!(out, "{}", row.join(","))?;
    }
    writeln!(out)
}

pub fn save_appvals(path: &Path, agg: &Aggregation, diag: &Diagnostics) -> SmapsResult<()> {
    diag.debug(&format!("{}: writing ...", path.display()));
    let file = fs::File::create(path).map_err(|e| SmapsError::io(path, e))?;
    let mut out = std::io::BufWriter::new(file);
    write_appvals(&mut out, agg)
        .and_then(|_| out.flush())
        .map_err(|e| SmapsError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Mapping;
    use crate::stats::CowPolicy;

    #[test]
    fn test_appvals_rows() {
        let mut maps = vec![
            Mapping {
                name: "top".into(),
                pid: 12,
                ppid: 1,
                threads: 2,
                path: "[heap]".into(),
                size: 40,
                resident: 24,
                private_dirty: 24,
                ..Mapping::default()
            },
            Mapping {
                name: "top".into(),
                pid: 12,
                ppid: 1,
                threads: 2,
                prot: "r-xp".into(),
                path: "/usr/bin/top".into(),
                size: 60,
                resident: 16,
                shared_clean: 16,
                ..Mapping::default()
            },
        ];
        for m in maps.iter_mut() {
            m.derive();
        }
        let agg = Aggregation::new(maps, CowPolicy::Recorded);

        let mut out = Vec::new();
        write_appvals(&mut out, &agg).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert!(lines[0].starts_with("generator = smaps-analyzer "));
        assert_eq!(lines[2], "name,pid,ppid,threads,pri,sha,cln,rss,size,cow,code,data,heap,anon,stack");
        assert_eq!(lines[3], "top,12,1,2,24,0,16,40,100,0,16,0,24,0,0");
        assert_eq!(lines[4], "");
    }
}
