// The de-duplicating merge engine: matches incoming entries against the
// target collection by sameness score, merges matched entries field by
// field through an optional conflict resolver, appends the rest, and
// records enough before-state for an exact undo.

use crate::collection::Collection;
use crate::compare::score::{score_entries, ENTRY_GOOD_MATCH, ENTRY_PERFECT_MATCH};
use crate::compare::{CompareContext, FieldComparison};
use crate::entry::{Entry, EntryId};
use crate::error::Result;
use crate::images::NoImages;
use crate::reconcile::{self, ReconcileReport};
use crate::schema::{format, Field, FieldType};

/// A resolver's decision for one conflicting value pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Keep the existing value.
    KeepFirst,
    /// Overwrite with the incoming value.
    KeepSecond,
    /// Abort the whole merge operation.
    CancelMerge,
}

/// Caller-supplied conflict resolution, typically backed by a dialog.
/// Invoked once per irreconcilable difference — whole-field values for
/// ordinary fields, single column values for table fields.
pub trait Resolver {
    fn resolve(
        &mut self,
        existing: &Entry,
        incoming: &Entry,
        field: &Field,
        existing_value: &str,
        incoming_value: &str,
    ) -> Resolution;
}

/// One field-level overwrite performed on an existing entry, with the
/// value it held before the change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldChange {
    pub entry: EntryId,
    pub field: String,
    pub old_value: String,
}

/// The outcome of a merge: the entries created, the overwrites applied to
/// existing entries (in application order, for reverse-order undo), the
/// schema reconciliation summary, and whether a resolver cancelled the
/// operation partway through. A cancelled report still describes every
/// change that was applied, so the caller can undo the partial merge.
#[derive(Debug, Default, Clone)]
pub struct MergeReport {
    pub added: Vec<EntryId>,
    pub changes: Vec<FieldChange>,
    pub fields: ReconcileReport,
    pub cancelled: bool,
}

impl MergeReport {
    /// Whether the merge changed the target collection at all.
    pub fn changed(&self) -> bool {
        !self.added.is_empty() || !self.changes.is_empty() || !self.fields.is_empty()
    }
}

/// What `merge_entry` did to the existing entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    Changed,
    Unchanged,
    Cancelled,
}

/// Purely additive combine: reconcile the incoming schema into the target,
/// then clone every incoming entry into the target's ownership. No
/// duplicate matching is attempted. Returns the ids of the appended
/// entries, for a later `un_append_collection`.
pub fn append_collection(target: &mut Collection, incoming: &Collection) -> Result<Vec<EntryId>> {
    target.begin_batch();
    let result = (|| {
        reconcile::merge_fields(target, incoming)?;
        let clones: Vec<Entry> = incoming.entries().cloned().collect();
        Ok(target.add_entries(clones))
    })();
    target.end_batch();
    result
}

/// De-duplicating merge of the incoming collection into the target.
///
/// Both entry sets are sorted by title so the scan can start from the
/// previous match's index — a cost optimization only, never required for
/// correctness. The first candidate scoring a perfect match is accepted
/// immediately; otherwise the whole list is scanned and the best candidate
/// at or above the good threshold is used as a fallback.
pub fn merge_collection(
    target: &mut Collection,
    incoming: &Collection,
    mut resolver: Option<&mut dyn Resolver>,
) -> Result<MergeReport> {
    let mut report = MergeReport::default();
    if incoming.fields().is_empty() && incoming.is_empty() {
        return Ok(report);
    }

    target.begin_batch();
    let result = (|| {
        report.fields = reconcile::merge_fields(target, incoming)?;

        let curr = sorted_by_title(target);
        let incoming_sorted = sorted_by_title(incoming);
        let curr_total = curr.len();

        let mut pending: Vec<Entry> = Vec::new();
        let mut last_match = 0usize;
        // once one match shares its id, later incoming entries are checked
        // against the same id first — cheap for collections that diverged
        // from a common ancestor
        let mut check_same_id = false;

        for new_id in incoming_sorted {
            let new_entry = match incoming.entry(new_id) {
                Some(e) => e,
                None => continue,
            };
            let mut best_match = 0;
            let mut match_id: Option<EntryId> = None;

            if check_same_id {
                if let Some(cand) = target.entry(new_entry.id()) {
                    if score_entries(target, cand, new_entry) >= ENTRY_PERFECT_MATCH {
                        match_id = Some(cand.id());
                    }
                }
            }
            if match_id.is_none() && curr_total > 0 {
                for i in 0..curr_total {
                    let idx = (i + last_match) % curr_total;
                    let cand = match target.entry(curr[idx]) {
                        Some(e) => e,
                        None => continue,
                    };
                    let score = score_entries(target, cand, new_entry);
                    if score >= ENTRY_PERFECT_MATCH {
                        match_id = Some(cand.id());
                        last_match = idx;
                        break;
                    } else if score >= ENTRY_GOOD_MATCH && score > best_match {
                        best_match = score;
                        match_id = Some(cand.id());
                        last_match = idx;
                        // keep scanning for a better good match
                    }
                }
            }

            match match_id {
                Some(mid) => {
                    check_same_id = check_same_id || mid == new_entry.id();
                    let outcome = merge_entry(
                        target,
                        mid,
                        new_entry,
                        &mut resolver,
                        &mut report.changes,
                    )?;
                    if outcome == MergeOutcome::Cancelled {
                        report.cancelled = true;
                        break;
                    }
                }
                None => pending.push(new_entry.clone()),
            }
        }

        // bulk append once so observers and indices settle a single time
        report.added = target.add_entries(pending);
        Ok(())
    })();
    target.end_batch();
    result.map(|()| report)
}

/// Merge the incoming entry's values into an existing entry of the
/// collection, field by field. Every overwrite is recorded in `changes`
/// with the value it replaced. A resolver cancellation returns
/// immediately; values already written in this call stay written —
/// rollback belongs to the undo path, not here.
pub fn merge_entry(
    coll: &mut Collection,
    existing_id: EntryId,
    incoming: &Entry,
    resolver: &mut Option<&mut dyn Resolver>,
    changes: &mut Vec<FieldChange>,
) -> Result<MergeOutcome> {
    let existing = match coll.entry(existing_id) {
        Some(e) => e.clone(),
        None => {
            log::warn!("merge_entry: no entry {existing_id} in target collection");
            return Ok(MergeOutcome::Unchanged);
        }
    };
    let fields: Vec<Field> = coll.fields().to_vec();
    let mut changed = false;

    for field in &fields {
        // id, cdate and mdate stay unique to each entry
        if field.is_reserved() {
            continue;
        }
        let incoming_value = incoming.value(&field.name);
        if incoming_value.is_empty() {
            continue;
        }
        let existing_value = existing.value(&field.name);
        if existing_value == incoming_value {
            continue;
        }

        if existing_value.is_empty() {
            apply(coll, existing_id, field, existing_value, incoming_value, changes)?;
            changed = true;
        } else if field.field_type == FieldType::Table {
            match merge_table_field(
                coll,
                existing_id,
                &existing,
                incoming,
                field,
                existing_value,
                incoming_value,
                resolver,
                changes,
            )? {
                MergeOutcome::Changed => changed = true,
                MergeOutcome::Cancelled => return Ok(MergeOutcome::Cancelled),
                MergeOutcome::Unchanged => {}
            }
        } else if let Some(r) = resolver.as_deref_mut() {
            match r.resolve(&existing, incoming, field, existing_value, incoming_value) {
                Resolution::CancelMerge => return Ok(MergeOutcome::Cancelled),
                Resolution::KeepSecond => {
                    apply(coll, existing_id, field, existing_value, incoming_value, changes)?;
                    changed = true;
                }
                Resolution::KeepFirst => {}
            }
        } else {
            // no resolver: never overwrite silently
            log::debug!(
                "conflicting values for '{}', keeping existing value",
                field.name
            );
        }
    }

    Ok(if changed { MergeOutcome::Changed } else { MergeOutcome::Unchanged })
}

/// Positional merge of a table field: rows keep their index, the shorter
/// side is padded, and only a position holding two differing non-empty
/// column values is a conflict.
#[allow(clippy::too_many_arguments)]
fn merge_table_field(
    coll: &mut Collection,
    existing_id: EntryId,
    existing: &Entry,
    incoming: &Entry,
    field: &Field,
    existing_value: &str,
    incoming_value: &str,
    resolver: &mut Option<&mut dyn Resolver>,
    changes: &mut Vec<FieldChange>,
) -> Result<MergeOutcome> {
    let mut rows = format::split_table(existing_value);
    let incoming_rows = format::split_table(incoming_value);
    while rows.len() < incoming_rows.len() {
        rows.push(String::new());
    }

    let mut field_changed = false;
    for (i, incoming_row) in incoming_rows.iter().enumerate() {
        if incoming_row.is_empty() {
            continue;
        }
        if rows[i].is_empty() {
            rows[i] = incoming_row.clone();
            field_changed = true;
            continue;
        }
        let mut columns = format::split_row(&rows[i]);
        let incoming_columns = format::split_row(incoming_row);
        while columns.len() < incoming_columns.len() {
            columns.push(String::new());
        }
        let mut row_changed = false;
        for (j, incoming_column) in incoming_columns.iter().enumerate() {
            if incoming_column.is_empty() {
                continue;
            }
            if columns[j].is_empty() {
                columns[j] = incoming_column.clone();
                row_changed = true;
            } else if columns[j] != *incoming_column {
                if let Some(r) = resolver.as_deref_mut() {
                    match r.resolve(existing, incoming, field, &columns[j], incoming_column) {
                        Resolution::CancelMerge => return Ok(MergeOutcome::Cancelled),
                        Resolution::KeepSecond => {
                            columns[j] = incoming_column.clone();
                            row_changed = true;
                        }
                        Resolution::KeepFirst => {}
                    }
                }
            }
        }
        if row_changed {
            rows[i] = format::join_row(&columns);
            field_changed = true;
        }
    }

    if field_changed {
        let merged = format::join_table(&rows);
        apply(coll, existing_id, field, existing_value, &merged, changes)?;
        return Ok(MergeOutcome::Changed);
    }
    Ok(MergeOutcome::Unchanged)
}

fn apply(
    coll: &mut Collection,
    id: EntryId,
    field: &Field,
    old_value: &str,
    new_value: &str,
    changes: &mut Vec<FieldChange>,
) -> Result<()> {
    coll.set_entry_value(id, &field.name, new_value)?;
    changes.push(FieldChange {
        entry: id,
        field: field.name.clone(),
        old_value: old_value.to_string(),
    });
    Ok(())
}

/// Undo an `append_collection`: restore the original field definitions,
/// remove the appended entries, then drop any field not present before
/// the append. Entries go first — removing a field visits every entry to
/// clear its value, so pruning before entry removal would do wasted work
/// against entries about to disappear.
pub fn un_append_collection(
    coll: &mut Collection,
    original_fields: &[Field],
    added: &[EntryId],
) -> Result<()> {
    coll.begin_batch();
    for field in original_fields {
        coll.modify_field(field.clone());
    }
    coll.remove_entries(added);
    prune_fields(coll, original_fields)?;
    coll.end_batch();
    Ok(())
}

/// Undo a `merge_collection`: remove the entries the merge created, then
/// walk the recorded overwrites in reverse order — a field may have been
/// overwritten several times across one merge, and only reverse iteration
/// lands on the true original value — and finally prune fields the merge
/// introduced.
pub fn un_merge_collection(
    coll: &mut Collection,
    original_fields: &[Field],
    report: &MergeReport,
) -> Result<()> {
    coll.begin_batch();
    for field in original_fields {
        coll.modify_field(field.clone());
    }
    coll.remove_entries(&report.added);
    for change in report.changes.iter().rev() {
        if coll.entry(change.entry).is_none() {
            log::warn!("un_merge: entry {} no longer exists", change.entry);
            continue;
        }
        coll.set_entry_value(change.entry, &change.field, &change.old_value)?;
    }
    prune_fields(coll, original_fields)?;
    coll.end_batch();
    Ok(())
}

fn prune_fields(coll: &mut Collection, original_fields: &[Field]) -> Result<()> {
    let extra: Vec<String> = coll
        .fields()
        .iter()
        .filter(|f| !original_fields.iter().any(|orig| orig.name == f.name))
        .map(|f| f.name.clone())
        .collect();
    for name in extra {
        coll.remove_field(&name, true)?;
    }
    Ok(())
}

/// Entry ids sorted by the collection's title field, stably. Collections
/// without a title field keep arena order.
fn sorted_by_title(coll: &Collection) -> Vec<EntryId> {
    let mut ids = coll.entry_ids();
    if let Some(title_field) = coll.field("title") {
        let cmp = FieldComparison::for_field(title_field, coll);
        let ctx = CompareContext::new(coll, &NoImages);
        ids.sort_by(|a, b| match (coll.entry(*a), coll.entry(*b)) {
            (Some(ea), Some(eb)) => cmp.compare_entries(ea, eb, &ctx),
            _ => std::cmp::Ordering::Equal,
        });
    }
    ids
}
