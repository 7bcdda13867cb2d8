// One record of a collection: field-name -> formatted-value pairs plus
// implicit bookkeeping stamps that are unique to the entry.

use crate::schema::format;
use crate::schema::Field;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Stable identifier of an entry, unique within its collection.
pub type EntryId = u64;

/// A single catalog record. Values are stored as formatted strings keyed by
/// field name; empty values are not stored. The id, creation date and
/// modification date are implicit fields that are never merged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    id: EntryId,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    values: BTreeMap<String, String>,
}

impl Entry {
    pub fn new(id: EntryId) -> Self {
        let now = Utc::now();
        Entry {
            id,
            created_at: now,
            modified_at: now,
            values: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> EntryId {
        self.id
    }

    /// Reassign the entry's id. Only the owning collection does this, when
    /// an entry is adopted and its id would collide.
    pub(crate) fn set_id(&mut self, id: EntryId) {
        self.id = id;
    }

    /// The formatted value of a field, or "" when unset.
    pub fn value(&self, field_name: &str) -> &str {
        self.values.get(field_name).map(|s| s.as_str()).unwrap_or("")
    }

    /// Set a field's value. Setting an empty value clears the field.
    /// The modification stamp is not touched here; document-level edits
    /// stamp it explicitly so that merge undo restores exact state.
    pub fn set_value(&mut self, field_name: &str, value: &str) {
        if value.is_empty() {
            self.values.remove(field_name);
        } else {
            self.values.insert(field_name.to_string(), value.to_string());
        }
    }

    pub fn has_value(&self, field_name: &str) -> bool {
        self.values.contains_key(field_name)
    }

    /// The individual values of a multiple-value field.
    /// For single-value fields this is a one-element (or empty) list.
    pub fn values_of(&self, field: &Field) -> Vec<String> {
        let raw = self.value(&field.name);
        if field.flags.allow_multiple {
            format::split_values(raw)
        } else if raw.is_empty() {
            Vec::new()
        } else {
            vec![raw.to_string()]
        }
    }

    /// Iterate over the stored (field name, value) pairs in name order.
    pub fn values(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Names of the fields this entry holds a value for.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(|k| k.as_str())
    }

    /// Convenience accessor for the title field.
    pub fn title(&self) -> &str {
        self.value("title")
    }

    /// Update the modification stamp.
    pub fn touch(&mut self) {
        self.modified_at = Utc::now();
    }

    /// Whether the stored field values of two entries are identical,
    /// ignoring id and date stamps.
    pub fn same_values(&self, other: &Entry) -> bool {
        self.values == other.values
    }
}
