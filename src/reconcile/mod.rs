// Field-schema reconciliation: folding an incoming collection's field
// definitions into a target collection before its entries are merged.

use crate::collection::Collection;
use crate::entry::Entry;
use crate::error::Result;
use crate::schema::{Field, FieldType};

/// What `merge_field` did to the target schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldMergeStatus {
    /// The field did not exist and was appended.
    Created,
    /// An existing Choice field's allowed-value list was widened.
    Modified,
    /// The target already had an equivalent field; nothing changed.
    Unchanged,
}

/// Names of fields created and structurally modified by a reconciliation,
/// for surfacing to the user.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReconcileReport {
    pub created: Vec<String>,
    pub modified: Vec<String>,
}

impl ReconcileReport {
    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.modified.is_empty()
    }
}

/// Merge one incoming field definition into the target collection.
///
/// A missing field is appended as a copy. An existing Choice field has its
/// allowed-value list widened: the target's values keep their order, and
/// an incoming value is appended only when at least one of the provided
/// entries actually uses it. An existing field with nothing to widen is
/// left untouched.
pub fn merge_field(
    target: &mut Collection,
    incoming: &Field,
    entries: &[&Entry],
) -> Result<FieldMergeStatus> {
    let existing = match target.field(&incoming.name) {
        Some(f) => f.clone(),
        None => {
            target.add_field(incoming.clone())?;
            return Ok(FieldMergeStatus::Created);
        }
    };

    if existing.field_type != FieldType::Choice || incoming.field_type != FieldType::Choice {
        return Ok(FieldMergeStatus::Unchanged);
    }

    let mut allowed = existing.allowed.clone();
    for value in &incoming.allowed {
        if allowed.contains(value) {
            continue;
        }
        // only import an allowed value some entry actually holds
        if entries.iter().any(|e| e.value(&incoming.name) == *value) {
            allowed.push(value.clone());
        }
    }

    if allowed.len() == existing.allowed.len() {
        return Ok(FieldMergeStatus::Unchanged);
    }

    let mut widened = existing;
    widened.allowed = allowed;
    target.modify_field(widened);
    Ok(FieldMergeStatus::Modified)
}

/// Reconcile every field of the incoming collection into the target.
/// Incoming entries drive the Choice allowed-value filter.
pub fn merge_fields(target: &mut Collection, incoming: &Collection) -> Result<ReconcileReport> {
    let entries: Vec<&Entry> = incoming.entries().collect();
    let mut report = ReconcileReport::default();
    for field in incoming.fields() {
        match merge_field(target, field, &entries)? {
            FieldMergeStatus::Created => report.created.push(field.name.clone()),
            FieldMergeStatus::Modified => report.modified.push(field.name.clone()),
            FieldMergeStatus::Unchanged => {}
        }
    }
    Ok(report)
}
