//! Normalized CSV interchange format.
//!
//! ```text
//! generator=smaps-analyzer 0.1.0
//!
//! name,pid,ppid,threads,head,tail,prot,offs,node,flag,path,size,rss,...
//! dbus-daemon,123,1,1,32768,180224,r-xp,0,1f:03,417,/usr/bin/dbus-daemon,144,116,...
//!
//! ```

use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use crate::diagnostics::Diagnostics;
use crate::error::{SmapsError, SmapsResult};
use crate::model::{Mapping, MAPPING_FIELDS};

/// Program identification written into generated headers.
pub fn generator() -> String {
    format!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
}

/// Makes a value safe for a comma separated cell.
pub fn to_csv(value: &str) -> String {
    value.replace(',', "_")
}

pub fn write_csv<W: Write>(out: &mut W, maps: &[Mapping]) -> std::io::Result<()> {
    writeln!(out, "generator={}", generator())?;
    writeln!(out)?;

    let labels: Vec<&str> = MAPPING_FIELDS.iter().map(|f| f.name).collect();
    writeln!(out, "{}", labels.join(","))?;

    for m in maps {
        let row: Vec<String> = MAPPING_FIELDS.iter().map(|f| to_csv(&f.render(m))).collect();
        writeln!(out, "{}", row.join(","))?;
    }
    writeln!(out)
}

pub fn save_csv(path: &Path, maps: &[Mapping], diag: &Diagnostics) -> SmapsResult<()> {
    diag.debug(&format!("{}: writing ...", path.display()));
    let file = fs::File::create(path).map_err(|e| SmapsError::io(path, e))?;
    let mut out = std::io::BufWriter::new(file);
    write_csv(&mut out, maps)
        .and_then(|_| out.flush())
        .map_err(|e| SmapsError::io(path, e))
}

/// Parses normalized CSV. Columns are matched by label, so their order in
/// the file is free; every catalog label must be present.
pub fn parse_csv<R: BufRead>(reader: R, source: &str, diag: &Diagnostics) -> SmapsResult<Vec<Mapping>> {
    let mut lines = Vec::new();
    for line in reader.lines() {
        let line = line.map_err(|e| SmapsError::io(source, e))?;
        lines.push(line.trim_end().to_string());
    }
    let mut lines = lines.into_iter().peekable();

    // header block: key=value lines up to the first blank line
    let mut header = 0;
    while let Some(s) = lines.peek() {
        if s.is_empty() {
            if header == 0 {
                diag.warning(&format!("{}: empty header?", source));
            }
            lines.next();
            break;
        }
        if !s.contains('=') {
            diag.warning(&format!("{}: malformed header?", source));
            break;
        }
        header += 1;
        lines.next();
    }

    let labels: Vec<String> = match lines.next_if(|s| !s.is_empty()) {
        Some(s) => s.split(',').map(|l| l.trim().to_string()).collect(),
        None => {
            diag.warning(&format!("{}: no labels?", source));
            Vec::new()
        }
    };

    let mut columns = Vec::with_capacity(MAPPING_FIELDS.len());
    for field in MAPPING_FIELDS {
        let Some(col) = labels.iter().position(|l| l == field.name) else {
            return Err(SmapsError::BrokenCsv {
                path: source.into(),
                reason: format!("missing column '{}'", field.name),
            });
        };
        columns.push(col);
    }

    let mut maps = Vec::new();
    for (lineno, s) in lines.take_while(|s| !s.is_empty()).enumerate() {
        let cells: Vec<&str> = s.split(',').collect();
        if cells.len() != labels.len() {
            diag.warning(&format!(
                "{}: row {}: expected {} columns, got {}",
                source,
                lineno + 1,
                labels.len(),
                cells.len()
            ));
            continue;
        }

        let mut m = Mapping::default();
        for (field, &col) in MAPPING_FIELDS.iter().zip(&columns) {
            if let Err(e) = field.apply(&mut m, cells[col]) {
                diag.warning(&format!("{}: row {}: {}", source, lineno + 1, e));
            }
        }
        m.derive();
        maps.push(m);
    }

    if maps.is_empty() {
        diag.warning(&format!("{}: no table?", source));
    }
    Ok(maps)
}

/// Reads a normalized CSV file. A missing file is fatal.
pub fn load_csv(path: &Path, diag: &Diagnostics) -> SmapsResult<Vec<Mapping>> {
    if !path.is_file() {
        return Err(SmapsError::MissingInput(path.to_path_buf()));
    }
    diag.debug(&format!("{}: reading ...", path.display()));
    let file = fs::File::open(path).map_err(|e| SmapsError::io(path, e))?;
    parse_csv(BufReader::new(file), &path.display().to_string(), diag)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Verbosity;
    use std::io::Cursor;

    fn mapping(name: &str, pid: u32, path: &str, prot: &str) -> Mapping {
        let mut m = Mapping {
            name: name.into(),
            pid,
            ppid: 1,
            head: 0x8000,
            tail: 0x9000,
            prot: prot.into(),
            path: path.into(),
            size: 4,
            resident: 4,
            private_dirty: 4,
            ..Mapping::default()
        };
        m.derive();
        m
    }

    #[test]
    fn test_to_csv_replaces_commas() {
        assert_eq!(to_csv("/tmp/a,b,c"), "/tmp/a_b_c");
        assert_eq!(to_csv("plain"), "plain");
    }

    #[test]
    fn test_write_csv_layout() {
        let mut out = Vec::new();
        write_csv(&mut out, &[mapping("sh", 5, "/bin/sh", "r-xp")]).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert!(lines[0].starts_with("generator=smaps-analyzer "));
        assert_eq!(lines[1], "");
        assert_eq!(
            lines[2],
            "name,pid,ppid,threads,head,tail,prot,offs,node,flag,path,size,rss,shacln,shadty,pricln,pridty,pri,sha,cln,cow"
        );
        assert_eq!(lines[3], "sh,5,1,1,32768,36864,r-xp,0,00:00,0,/bin/sh,4,4,0,0,0,4,4,0,0,0");
        assert_eq!(lines[4], "");
        assert_eq!(lines.len(), 5);
    }

    #[test]
    fn test_parse_csv_reorders_columns_by_label() {
        let diag = Diagnostics::new(Verbosity::Silent);
        let text = "\
generator=test 1

path,name,pid,ppid,threads,head,tail,prot,offs,node,flag,size,rss,shacln,shadty,pricln,pridty,pri,sha,cln,cow
[heap],app,7,1,2,0,4096,rw-p,0,00:00,0,8,8,0,0,0,8,0,0,0,0
";
        let maps = parse_csv(Cursor::new(text), "t", &diag).unwrap();
        assert_eq!(maps.len(), 1);
        assert_eq!(maps[0].name, "app");
        assert_eq!(maps[0].threads, 2);
        assert_eq!(maps[0].category, "heap");
        // derived again from the raw columns
        assert_eq!(maps[0].private, 8);
        assert_eq!(diag.warning_count(), 0);
    }

    #[test]
    fn test_parse_csv_without_header_warns() {
        let diag = Diagnostics::new(Verbosity::Silent);
        let mut text = Vec::new();
        write_csv(&mut text, &[mapping("a", 1, "/bin/a", "r-xp")]).unwrap();
        let text = String::from_utf8(text).unwrap();
        let body = text.splitn(3, '\n').nth(2).unwrap();

        let maps = parse_csv(Cursor::new(body), "t", &diag).unwrap();
        assert_eq!(maps.len(), 1);
        assert_eq!(diag.warning_count(), 1);
    }

    #[test]
    fn test_parse_csv_skips_ragged_rows() {
        let diag = Diagnostics::new(Verbosity::Silent);
        let mut text = Vec::new();
        write_csv(&mut text, &[mapping("a", 1, "/bin/a", "r-xp")]).unwrap();
        let mut text = String::from_utf8(text).unwrap();
        text.truncate(text.len() - 1);
        text.push_str("a,1,2\n\n");

        let maps = parse_csv(Cursor::new(text), "t", &diag).unwrap();
        assert_eq!(maps.len(), 1);
        assert_eq!(diag.warning_count(), 1);
    }

    #[test]
    fn test_parse_csv_missing_label_is_fatal() {
        let diag = Diagnostics::new(Verbosity::Silent);
        let text = "generator=x\n\nname,pid\nsh,1\n\n";
        let err = parse_csv(Cursor::new(text), "broken.csv", &diag).unwrap_err();
        assert!(matches!(err, SmapsError::BrokenCsv { .. }));
        assert!(err.to_string().contains("ppid"));
    }

    #[test]
    fn test_round_trip() {
        let diag = Diagnostics::new(Verbosity::Silent);
        let maps = vec![
            mapping("a", 1, "/bin/a", "r-xp"),
            mapping("b", 2, "[stack]", "rw-p"),
            mapping("c", 3, "[anon]", "rw-p"),
        ];
        let mut out = Vec::new();
        write_csv(&mut out, &maps).unwrap();

        let back = parse_csv(Cursor::new(out), "t", &diag).unwrap();
        assert_eq!(back, maps);
    }
}
