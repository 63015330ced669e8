//! Raw capture format reader and writer.
//!
//! A capture is a sequence of records:
//!
//! ```text
//! ==> /proc/123/smaps <==
//! #Name: dbus-daemon
//! #Pid: 123
//! #PPid: 1
//! 00008000-0002c000 r-xp 00000000 1f:03 417  /usr/bin/dbus-daemon
//! Size:               144 kB
//! Rss:                116 kB
//! ...
//! ```

use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use crate::diagnostics::Diagnostics;
use crate::error::{SmapsError, SmapsResult};
use crate::model::schema::by_label;
use crate::model::{Capture, CAPTURE_FIELDS};

/// Returns the tag text if `line` is a record tag line.
pub fn parse_tag(line: &str) -> Option<&str> {
    line.strip_prefix("==>")
        .and_then(|s| s.strip_suffix("<=="))
        .map(str::trim)
}

/// Parses raw capture text. Records are returned stable-sorted by pid.
pub fn parse_capture<R: BufRead>(reader: R, source: &str, diag: &Diagnostics) -> SmapsResult<Vec<Capture>> {
    let mut caps: Vec<Capture> = Vec::new();

    for line in reader.lines() {
        let line = line.map_err(|e| SmapsError::io(source, e))?;
        let s = line.trim();
        if s.is_empty() {
            continue;
        }

        if let Some(tag) = parse_tag(s) {
            caps.push(Capture::new(tag));
            continue;
        }

        let Some(cap) = caps.last_mut() else {
            diag.warning(&format!("{}: Ignoring: {}", source, s));
            continue;
        };

        if let Some(meta) = s.strip_prefix('#') {
            let Some((key, value)) = meta.split_once(':') else {
                diag.warning(&format!("{}: Ignoring: {}", source, s));
                continue;
            };
            let key = key.trim();
            match by_label(CAPTURE_FIELDS, key) {
                Some(field) => {
                    if let Err(e) = field.apply(cap, value) {
                        diag.warning(&format!("{}: {}: {}", source, cap.tag, e));
                    }
                }
                None => diag.warning(&format!(
                    "{}: unknown capture key: {}={}",
                    source,
                    key,
                    value.trim()
                )),
            }
            continue;
        }

        cap.body.push(s.to_string());
    }

    caps.sort_by_key(|c| c.pid);
    Ok(caps)
}

/// Reads a raw capture file. A missing file is fatal.
pub fn load_capture(path: &Path, diag: &Diagnostics) -> SmapsResult<Vec<Capture>> {
    if !path.is_file() {
        return Err(SmapsError::MissingInput(path.to_path_buf()));
    }
    diag.debug(&format!("{}: reading ...", path.display()));
    let file = fs::File::open(path).map_err(|e| SmapsError::io(path, e))?;
    parse_capture(BufReader::new(file), &path.display().to_string(), diag)
}

/// Writes captures back in raw capture format, one `#Key: Value` line per
/// catalog field, so the output can be fed to any capture consumer again.
pub fn write_capture<W: Write>(out: &mut W, caps: &[Capture]) -> std::io::Result<()> {
    for cap in caps {
        writeln!(out, "==>{}<==", cap.tag)?;
        for field in CAPTURE_FIELDS {
            if let Some(label) = field.label {
                writeln!(out, "#{}: {}", label, field.render(cap))?;
            }
        }
        for line in &cap.body {
            writeln!(out, "{}", line)?;
        }
        writeln!(out)?;
    }
    Ok(())
}

pub fn save_capture(path: &Path, caps: &[Capture], diag: &Diagnostics) -> SmapsResult<()> {
    diag.debug(&format!("{}: writing ...", path.display()));
    let file = fs::File::create(path).map_err(|e| SmapsError::io(path, e))?;
    let mut out = std::io::BufWriter::new(file);
    write_capture(&mut out, caps)
        .and_then(|_| out.flush())
        .map_err(|e| SmapsError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Verbosity;
    use std::io::Cursor;

    const SAMPLE: &str = "\
stray line before any record
==> /proc/20/smaps <==
#Name: worker
#Pid: 20
#PPid: 1
#VmSize:     2048 kB
#Bogus: 1
00008000-00010000 r-xp 00000000 1f:03 417 /usr/bin/worker
Size:                32 kB

==> /proc/1/smaps <==
#Name: init
#Pid: 1
#PPid: 0
";

    #[test]
    fn test_parse_tag() {
        assert_eq!(parse_tag("==> /proc/1/smaps <=="), Some("/proc/1/smaps"));
        assert_eq!(parse_tag("==>x<=="), Some("x"));
        assert_eq!(parse_tag("==> /proc/1/smaps"), None);
    }

    #[test]
    fn test_parse_capture_records() {
        let diag = Diagnostics::new(Verbosity::Silent);
        let caps = parse_capture(Cursor::new(SAMPLE), "sample", &diag).unwrap();

        assert_eq!(caps.len(), 2);
        // sorted by pid
        assert_eq!(caps[0].name, "init");
        assert_eq!(caps[1].pid, 20);
        assert_eq!(caps[1].ppid, 1);
        assert_eq!(caps[1].vm.size, 2048);
        assert_eq!(caps[1].body.len(), 2);
        // stray line and unknown key
        assert_eq!(diag.warning_count(), 2);
    }

    #[test]
    fn test_write_capture_round_trips() {
        let diag = Diagnostics::new(Verbosity::Silent);
        let caps = parse_capture(Cursor::new(SAMPLE), "sample", &diag).unwrap();

        let mut out = Vec::new();
        write_capture(&mut out, &caps).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("==>/proc/1/smaps<==\n#Name: init\n#Pid: 1\n"));

        let again = parse_capture(Cursor::new(text), "again", &diag).unwrap();
        assert_eq!(again.len(), caps.len());
        for (a, b) in caps.iter().zip(&again) {
            assert_eq!(a.pid, b.pid);
            assert_eq!(a.merge_key(), b.merge_key());
            assert_eq!(a.body, b.body);
        }
    }
}
