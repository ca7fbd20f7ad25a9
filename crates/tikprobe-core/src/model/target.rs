// ── Probe target list ──
//
// Targets arrive as one comma-joined string. The active list keeps
// first-seen order for logging, but only set membership matters when
// comparing reloads.

use std::collections::{BTreeSet, HashSet};

/// Split a comma-joined address list, trimming blanks and dropping
/// duplicates while keeping first-seen order.
pub fn parse_target_list(raw: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    raw.split(',')
        .map(str::trim)
        .filter(|addr| !addr.is_empty())
        .filter(|addr| seen.insert(*addr))
        .map(str::to_owned)
        .collect()
}

/// Order-independent comparison of two target lists.
pub fn same_target_set<A: AsRef<str>, B: AsRef<str>>(a: &[A], b: &[B]) -> bool {
    let a: BTreeSet<&str> = a.iter().map(AsRef::as_ref).collect();
    let b: BTreeSet<&str> = b.iter().map(AsRef::as_ref).collect();
    a == b
}
