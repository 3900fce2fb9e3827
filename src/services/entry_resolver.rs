use crate::constants::DOW_ALIAS;
use crate::models::SnapshotEntry;

/// Which matching tier picked the entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    DowAlias,
    Prefix,
    Substring,
}

/// Find the snapshot entry for a tracked index label.
///
/// Upstream display names drift ("S&P 500", "S&P 500 Index", "NASDAQ
/// Composite"), so matching is tiered:
/// 1. the Dow is matched by its short alias, whatever the rest of the label says
/// 2. first entry whose name starts with the label
/// 3. first entry whose name contains the label
///
/// Comparison is case-insensitive on trimmed strings. Returns `None` when no
/// tier matches.
pub fn resolve_entry<'a>(entries: &'a [SnapshotEntry], label: &str) -> Option<(&'a SnapshotEntry, MatchKind)> {
    let label = label.trim().to_uppercase();
    if label.is_empty() {
        return None;
    }

    if label.starts_with(DOW_ALIAS) {
        return entries
            .iter()
            .find(|e| normalized(&e.name).starts_with(DOW_ALIAS))
            .map(|e| (e, MatchKind::DowAlias));
    }

    if let Some(entry) = entries.iter().find(|e| normalized(&e.name).starts_with(&label)) {
        return Some((entry, MatchKind::Prefix));
    }

    entries
        .iter()
        .find(|e| normalized(&e.name).contains(&label))
        .map(|e| (e, MatchKind::Substring))
}

fn normalized(name: &str) -> String {
    name.trim().to_uppercase()
}
