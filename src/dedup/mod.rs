use std::collections::{HashMap, HashSet};

use chrono::{DateTime, NaiveDate, NaiveDateTime};

use crate::correlation;
use crate::review_record::ReviewRecord;

/// The outcome of planning a deduplication over one snapshot of records.
///
/// Planning is pure; nothing is deleted until the arbiter applies the plan
/// through the local store adapter.
#[derive(Debug, Clone, PartialEq)]
pub struct DedupPlan {
    /// Ids chosen as group survivors in at least one pass.
    /// A survivor is protected even where the other pass marked it.
    pub survivors: HashSet<i64>,
    /// Marked-and-unprotected ids, sorted ascending for deterministic apply
    /// order.
    pub deletions: Vec<i64>,
}

impl DedupPlan {
    pub fn is_empty(&self) -> bool {
        self.deletions.is_empty()
    }
}

/// Result of an applied deduplication run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DedupReport {
    pub removed: usize,
}

/// Plans the collapse of a snapshot to at most one record per identity.
///
/// Two independent passes: groups by strict key (type/name/breeder/farm) and
/// by loose key (type/name). The strict pass alone misses early drafts saved
/// before breeder/farm were known; a loose-only pass would merge genuinely
/// distinct products sharing a name. Survivors of either pass are protected
/// from the other pass's verdict.
///
/// Records that were never assigned an id do not participate.
pub fn plan(records: &[ReviewRecord]) -> DedupPlan {
    let stored: Vec<&ReviewRecord> = records.iter().filter(|r| r.id.is_some()).collect();

    let by_strict = group_by(&stored, |record| {
        record
            .correlation_key
            .clone()
            .unwrap_or_else(|| correlation::strict_key(record))
    });
    let by_loose = group_by(&stored, correlation::loose_key);

    let mut survivors = HashSet::new();
    let mut marked = HashSet::new();
    for groups in &[by_strict, by_loose] {
        for group in groups.values() {
            let best = select_survivor(group);
            if let Some(best_id) = best.id {
                survivors.insert(best_id);
            }
            if group.len() > 1 {
                for record in group {
                    if record.id != best.id {
                        marked.extend(record.id);
                    }
                }
            }
        }
    }

    let mut deletions: Vec<i64> = marked.difference(&survivors).cloned().collect();
    deletions.sort_unstable();

    DedupPlan {
        survivors,
        deletions,
    }
}

fn group_by<'a, K: FnMut(&ReviewRecord) -> String>(
    records: &[&'a ReviewRecord],
    mut key: K,
) -> HashMap<String, Vec<&'a ReviewRecord>> {
    let mut groups: HashMap<String, Vec<&ReviewRecord>> = HashMap::new();
    for record in records {
        groups.entry(key(record)).or_default().push(record);
    }
    groups
}

/// The freshest record of a group wins: non-drafts beat drafts, then the most
/// recent modification date. Among equals the lowest id wins, keeping the
/// choice deterministic.
fn select_survivor<'a>(group: &[&'a ReviewRecord]) -> &'a ReviewRecord {
    group
        .iter()
        .copied()
        .max_by_key(|record| {
            (
                !record.is_draft,
                date_timestamp(&record.date),
                std::cmp::Reverse(record.id.unwrap_or(i64::MAX)),
            )
        })
        .expect("groups are never empty")
}

/// Milliseconds since epoch for the tie-break. Unparsable or missing dates
/// sort as earliest.
fn date_timestamp(date: &str) -> i64 {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(date) {
        return parsed.timestamp_millis();
    }
    if let Ok(parsed) = NaiveDateTime::parse_from_str(date, "%Y-%m-%dT%H:%M:%S") {
        return parsed.timestamp_millis();
    }
    if let Ok(parsed) = NaiveDate::parse_from_str(date, "%Y-%m-%d") {
        return parsed.and_hms(0, 0, 0).timestamp_millis();
    }
    i64::MIN
}
