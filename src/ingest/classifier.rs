//! Mapping classification: capture body lines to typed [`Mapping`] records.
//!
//! A body is a sequence of address-range lines, each followed by the
//! `Key: Value kB` metric lines of that range:
//!
//! ```text
//! 4001d000-4013c000 r-xp 00000000 1f:03 1262  /lib/libc-2.5.so
//! Size:              1148 kB
//! Rss:                604 kB
//! Shared_Clean:       604 kB
//! ```

use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::diagnostics::Diagnostics;
use crate::model::schema::by_label;
use crate::model::{Capture, Mapping, ANON, MAPPING_FIELDS, NO_NAME};

/// `HEAD-TAIL` hex address range at the start of a line (32 or 64 bit).
static ADDRESS_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9A-Fa-f]+-[0-9A-Fa-f]+(\s|$)").expect("address pattern is valid"));

/// Splits off at most `max - 1` whitespace separated tokens; the remainder
/// (which may contain spaces, e.g. a path) becomes the last element.
fn split_fields(line: &str, max: usize) -> Vec<&str> {
    let mut out = Vec::with_capacity(max);
    let mut rest = line.trim();
    while !rest.is_empty() {
        if out.len() + 1 == max {
            out.push(rest);
            break;
        }
        match rest.find(char::is_whitespace) {
            Some(end) => {
                out.push(&rest[..end]);
                rest = rest[end..].trim_start();
            }
            None => {
                out.push(rest);
                break;
            }
        }
    }
    out
}

/// Result of parsing one address line.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum AddressLine {
    Parsed { mapping: Mapping, padded: bool },
    Malformed,
}

/// Parses an address line into a mapping owned by `cap`. Lines from old
/// captures that lack offset/device/inode columns are padded with defaults.
pub(crate) fn parse_address_line(line: &str, cap: &Capture) -> AddressLine {
    let mut fields = split_fields(line, 6);
    let mut padded = false;

    match fields.len() {
        2 => {
            fields.extend_from_slice(&["0", "00:00", "0", ANON]);
            padded = true;
        }
        3 => {
            let path = fields.pop().unwrap_or(ANON);
            fields.extend_from_slice(&["0", "00:00", "0", path]);
            padded = true;
        }
        _ => {}
    }
    if fields.len() < 5 {
        return AddressLine::Malformed;
    }
    if fields.len() < 6 {
        fields.push(ANON);
    }

    let Some((head, tail)) = fields[0].split_once('-') else {
        return AddressLine::Malformed;
    };
    let parsed = (
        u64::from_str_radix(head, 16),
        u64::from_str_radix(tail, 16),
        u64::from_str_radix(fields[2], 16),
        fields[4].parse::<u64>(),
    );
    let (Ok(head), Ok(tail), Ok(offset), Ok(flags)) = parsed else {
        return AddressLine::Malformed;
    };

    let mut mapping = Mapping::for_capture(cap);
    mapping.head = head;
    mapping.tail = tail;
    mapping.prot = fields[1].to_string();
    mapping.offset = offset;
    mapping.node = fields[3].to_string();
    mapping.flags = flags;
    mapping.path = fields[5].to_string();

    AddressLine::Parsed { mapping, padded }
}

/// Turns the body lines of every capture into classified mappings.
///
/// Captures still named [`NO_NAME`] are renamed after their first
/// executable file mapping. Every mapping is derived exactly once.
pub fn maps_from_captures(caps: &mut [Capture], diag: &Diagnostics) -> Vec<Mapping> {
    let mut oldstyle = false;
    let mut maps = Vec::new();

    for cap in caps.iter_mut() {
        let mut todo: Vec<Mapping> = Vec::new();

        for s in &cap.body {
            if ADDRESS_LINE.is_match(s) {
                match parse_address_line(s, cap) {
                    AddressLine::Parsed { mapping, padded } => {
                        oldstyle |= padded;
                        todo.push(mapping);
                    }
                    AddressLine::Malformed => diag.warning(&format!("Ignoring: {}", s)),
                }
                continue;
            }

            let (Some(curr), Some((key, value))) = (todo.last_mut(), s.split_once(':')) else {
                diag.warning(&format!("Ignoring: {}", s));
                continue;
            };
            // Pss, Swap, VmFlags, ... are not part of the model
            if let Some(field) = by_label(MAPPING_FIELDS, key.trim()) {
                let value = value.split_whitespace().next().unwrap_or("");
                if let Err(e) = field.apply(curr, value) {
                    diag.warning(&format!("PID {}: {}", cap.pid, e));
                }
            }
        }

        if cap.name.is_empty() || cap.name == NO_NAME {
            repair_name(cap, &mut todo, diag);
        }
        maps.extend(todo);
    }

    for m in maps.iter_mut() {
        m.derive();
        check_sizes(m, diag);
    }

    if oldstyle {
        diag.warning("old style smaps data encountered, added bogus data...");
    }
    maps
}

fn repair_name(cap: &mut Capture, todo: &mut [Mapping], diag: &Diagnostics) {
    let Some(exe) = todo
        .iter()
        .find(|m| m.is_executable() && m.path.contains('/'))
    else {
        return;
    };
    let Some(name) = Path::new(&exe.path).file_name() else {
        return;
    };

    cap.name = name.to_string_lossy().into_owned();
    diag.warning(&format!("fixed: {} name -> {}", cap.pid, cap.name));
    for m in todo.iter_mut() {
        m.name = cap.name.clone();
    }
}

/// Resident must fit in size and equal the sum of its parts.
fn check_sizes(m: &Mapping, diag: &Diagnostics) {
    let parts = m.clean + m.shared + m.private;
    if m.resident <= m.size && m.resident == parts {
        return;
    }
    diag.size_mismatch(|| {
        let mut msg = vec![
            "SIZE MISMATCH".to_string(),
            format!("Pid:{} {}:{}", m.pid, m.prot, m.file),
            format!("Size = {}", m.size),
            format!("RSS  = {}", m.resident),
            format!("Pri  = {}", m.private),
            format!("Sha  = {}", m.shared),
            format!("Cln  = {}", m.clean),
        ];
        if m.resident > m.size {
            msg.push("PROBLEM: RSS > Size".to_string());
        }
        if m.resident != parts {
            msg.push("PROBLEM: RSS != Pri + Sha + Cln".to_string());
        }
        msg.join("\n")
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Verbosity;

    fn capture(pid: u32, name: &str, body: &[&str]) -> Capture {
        let mut cap = Capture::new(format!("/proc/{}/smaps", pid));
        cap.pid = pid;
        cap.name = name.to_string();
        cap.body = body.iter().map(|s| s.to_string()).collect();
        cap
    }

    // -------------------------------------------------------------------------
    // Tests for address lines
    // -------------------------------------------------------------------------

    #[test]
    fn test_split_fields_keeps_path_spaces() {
        let v = split_fields("0000-1000 r--p 00000000 08:01 42   /tmp/my file.txt", 6);
        assert_eq!(v, vec!["0000-1000", "r--p", "00000000", "08:01", "42", "/tmp/my file.txt"]);
    }

    #[test]
    fn test_address_line_full() {
        let cap = capture(5, "app", &[]);
        let line = "7f3a1c000000-7f3a1c021000 rw-p 0000a000 00:00 0 [heap]";
        let AddressLine::Parsed { mapping, padded } = parse_address_line(line, &cap) else {
            panic!("line should parse");
        };
        assert!(!padded);
        assert_eq!(mapping.head, 0x7f3a1c000000);
        assert_eq!(mapping.tail, 0x7f3a1c021000);
        assert_eq!(mapping.offset, 0xa000);
        assert_eq!(mapping.path, "[heap]");
        assert_eq!(mapping.pid, 5);
    }

    #[test]
    fn test_address_line_padding() {
        let cap = capture(5, "app", &[]);

        let AddressLine::Parsed { mapping, padded } = parse_address_line("00008000-0000f000 r-xp", &cap) else {
            panic!("two tokens should be padded");
        };
        assert!(padded);
        assert_eq!(mapping.path, ANON);
        assert_eq!(mapping.node, "00:00");

        let AddressLine::Parsed { mapping, padded } =
            parse_address_line("00008000-0000f000 r-xp /sbin/init", &cap)
        else {
            panic!("three tokens should be padded");
        };
        assert!(padded);
        assert_eq!(mapping.path, "/sbin/init");

        let AddressLine::Parsed { mapping, padded } =
            parse_address_line("00008000-0000f000 rw-p 00000000 00:00 0", &cap)
        else {
            panic!("missing path means anonymous");
        };
        assert!(!padded);
        assert_eq!(mapping.path, ANON);

        assert_eq!(
            parse_address_line("00008000-0000f000 rw-p 00000000", &cap),
            AddressLine::Malformed
        );
    }

    // -------------------------------------------------------------------------
    // Tests for maps_from_captures
    // -------------------------------------------------------------------------

    #[test]
    fn test_maps_from_captures() {
        let diag = Diagnostics::new(Verbosity::Silent);
        let mut caps = vec![capture(
            7,
            "daemon",
            &[
                "00008000-00010000 r-xp 00000000 1f:03 417 /usr/bin/daemon",
                "Size:                32 kB",
                "Rss:                 20 kB",
                "Pss:                 10 kB",
                "Shared_Clean:        16 kB",
                "Shared_Dirty:         0 kB",
                "Private_Clean:        4 kB",
                "Private_Dirty:        0 kB",
                "00018000-00019000 rw-p 00008000 1f:03 417 /usr/bin/daemon",
                "Size:                 4 kB",
                "Rss:                  4 kB",
                "Private_Dirty:        4 kB",
                "00019000-0003a000 rwxp 00019000 00:00 0 [heap]",
                "Size:               132 kB",
            ],
        )];

        let maps = maps_from_captures(&mut caps, &diag);
        assert_eq!(maps.len(), 3);
        assert_eq!(maps[0].category, "code");
        assert_eq!(maps[0].clean, 20);
        assert_eq!(maps[1].category, "data");
        assert_eq!(maps[1].private, 4);
        assert_eq!(maps[2].category, "heap");
        assert!(maps.iter().all(|m| m.name == "daemon" && m.pid == 7));
        assert_eq!(diag.warning_count(), 0);
    }

    #[test]
    fn test_unknown_name_is_repaired_from_executable() {
        let diag = Diagnostics::new(Verbosity::Silent);
        let mut caps = vec![capture(
            9,
            NO_NAME,
            &[
                "00008000-00010000 rw-p 00000000 00:00 0",
                "00010000-00020000 r-xp 00000000 1f:03 9 [vdso]",
                "00020000-00030000 r-xp 00000000 1f:03 9 /opt/bin/player",
            ],
        )];

        let maps = maps_from_captures(&mut caps, &diag);
        assert_eq!(caps[0].name, "player");
        assert!(maps.iter().all(|m| m.name == "player"));
    }

    #[test]
    fn test_stray_lines_warn_and_continue() {
        let diag = Diagnostics::new(Verbosity::Silent);
        let mut caps = vec![capture(
            3,
            "x",
            &[
                "Size: 4 kB",
                "00008000-00010000 rw-p 00000000 00:00 0",
                "garbage without separator",
                "Rss: lots kB",
            ],
        )];

        let maps = maps_from_captures(&mut caps, &diag);
        assert_eq!(maps.len(), 1);
        assert_eq!(diag.warning_count(), 3);
    }

    #[test]
    fn test_oldstyle_warning_once_per_import() {
        let diag = Diagnostics::new(Verbosity::Silent);
        let mut caps = vec![capture(
            3,
            "x",
            &["00008000-00010000 r-xp /bin/x", "00010000-00018000 rw-p /bin/x"],
        )];

        let maps = maps_from_captures(&mut caps, &diag);
        assert_eq!(maps.len(), 2);
        assert_eq!(diag.warning_count(), 1);
    }

    #[test]
    fn test_size_mismatch_is_reported() {
        let diag = Diagnostics::new(Verbosity::Silent);
        let mut caps = vec![capture(
            3,
            "x",
            &["00008000-00010000 rw-p 00000000 00:00 0", "Size: 4 kB", "Rss: 8 kB"],
        )];

        maps_from_captures(&mut caps, &diag);
        assert_eq!(diag.size_mismatch_count(), 1);
    }
}
