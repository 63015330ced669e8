//! Process tree reconstruction and thread flattening.
//!
//! Older kernels expose every thread of a process as its own smaps entry.
//! Such entries show up as children of the main thread with an identical
//! name and identical whole-process counters; flattening folds them back
//! into one capture.

use ahash::AHashMap as HashMap;

use crate::diagnostics::Diagnostics;
use crate::model::Capture;

/// Offset for synthetic pids given to records without one.
pub const FALLBACK_PID_BASE: u32 = 100_000;

/// Pid encoded in a tag like `/proc/123/smaps`.
fn pid_from_tag(tag: &str) -> Option<u32> {
    tag.split('/').nth(2).and_then(|s| s.trim().parse().ok())
}

/// Assigns pids to records lacking one. Returns how many needed a fallback.
fn assign_missing_pids(caps: &mut [Capture]) -> usize {
    let mut missing = 0;
    for cap in caps.iter_mut().filter(|c| c.pid == 0) {
        cap.pid = pid_from_tag(&cap.tag).unwrap_or(FALLBACK_PID_BASE + missing as u32);
        missing += 1;
    }
    missing
}

/// Links captures into a tree by ppid and merges thread duplicates.
///
/// Returns the surviving captures in input order. Duplicate pids are
/// reported and the later record dropped. If no record carried a real pid
/// the source is assumed to be flat already and returned unchanged.
pub fn flatten(mut caps: Vec<Capture>, diag: &Diagnostics) -> Vec<Capture> {
    if caps.is_empty() {
        return caps;
    }
    let missing = assign_missing_pids(&mut caps);
    if missing == caps.len() {
        diag.warning("oldstyle capture file, not flattening ...");
        return caps;
    }

    let mut index: HashMap<u32, usize> = HashMap::new();
    let mut arena: Vec<Capture> = Vec::with_capacity(caps.len());
    for cap in caps {
        if index.contains_key(&cap.pid) {
            diag.error(&format!("duplicate PID {}", cap.pid));
            continue;
        }
        index.insert(cap.pid, arena.len());
        arena.push(cap);
    }

    build_tree(&mut arena, &index, diag);
    detach_cycles(&mut arena, diag);

    let roots: Vec<usize> = (0..arena.len()).filter(|&i| arena[i].parent.is_none()).collect();
    for root in roots {
        merge_threads(&mut arena, root, diag);
    }

    arena.into_iter().filter(|c| c.alive).collect()
}

fn build_tree(arena: &mut [Capture], index: &HashMap<u32, usize>, diag: &Diagnostics) {
    for i in 0..arena.len() {
        let (pid, ppid) = (arena[i].pid, arena[i].ppid);
        match index.get(&ppid) {
            Some(&parent) if pid != ppid => {
                arena[i].parent = Some(parent);
                arena[parent].children.push(i);
            }
            _ => {
                if pid != 1 {
                    diag.warning(&format!("PID {} -> nonexisting PPID {}", pid, ppid));
                }
                arena[i].ppid = 0;
            }
        }
    }
}

/// Marks `node` and everything below it as reachable.
fn mark_reachable(arena: &[Capture], node: usize, reached: &mut [bool]) {
    let mut stack = vec![node];
    while let Some(i) = stack.pop() {
        if !reached[i] {
            reached[i] = true;
            stack.extend(arena[i].children.iter().copied());
        }
    }
}

/// Turns one member of every ppid cycle into a root so that the whole
/// arena is reachable from some root.
fn detach_cycles(arena: &mut [Capture], diag: &Diagnostics) {
    let mut reached = vec![false; arena.len()];
    for i in 0..arena.len() {
        if arena[i].parent.is_none() {
            mark_reachable(arena, i, &mut reached);
        }
    }
    for i in 0..arena.len() {
        if reached[i] {
            continue;
        }
        diag.warning(&format!("PID {} -> PPID {} forms a cycle, detached", arena[i].pid, arena[i].ppid));
        if let Some(parent) = arena[i].parent.take() {
            arena[parent].children.retain(|&c| c != i);
        }
        arena[i].ppid = 0;
        mark_reachable(arena, i, &mut reached);
    }
}

/// Post-order merge: children are fully flattened before their parent
/// compares itself against them.
fn merge_threads(arena: &mut [Capture], node: usize, diag: &Diagnostics) {
    let children = arena[node].children.clone();
    for &child in &children {
        merge_threads(arena, child, diag);
    }

    let mut kept = Vec::with_capacity(children.len());
    for child in children {
        if arena[child].merge_key() == arena[node].merge_key() {
            diag.debug(&format!(
                "{}: merge {} -> {}",
                arena[node].name, arena[child].pid, arena[node].pid
            ));
            arena[child].alive = false;
            arena[node].threads += arena[child].threads;
            kept.extend(std::mem::take(&mut arena[child].children));
        } else {
            kept.push(child);
        }
    }

    let pid = arena[node].pid;
    for &child in &kept {
        arena[child].parent = Some(node);
        arena[child].ppid = pid;
    }
    arena[node].children = kept;
}
