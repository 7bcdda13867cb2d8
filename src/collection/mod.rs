// The in-memory catalog: an ordered field schema plus an arena of entries
// addressed by stable id. Observers receive change notices through mpsc
// channels; bulk operations run inside a batch scope that coalesces all
// notices into a single structural-change notice.

use crate::entry::{Entry, EntryId};
use crate::error::{ColligoError, Result};
use crate::schema::{Field, FieldType};
use std::collections::{BTreeMap, HashMap};
use std::sync::mpsc;

/// A change notice delivered to collection observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeNotice {
    /// Fields were added/modified/removed, or entries added/removed.
    Structural,
    /// One or more entry values changed.
    EntriesChanged,
}

/// The set of fields and entries for one catalog.
#[derive(Debug)]
pub struct Collection {
    title: String,
    fields: Vec<Field>,
    entries: BTreeMap<EntryId, Entry>,
    next_id: EntryId,
    group_cache: HashMap<String, BTreeMap<String, Vec<EntryId>>>,
    observers: Vec<mpsc::Sender<ChangeNotice>>,
    batch_depth: u32,
    batch_dirty: bool,
}

impl Collection {
    pub fn new(title: &str) -> Self {
        Collection {
            title: title.to_string(),
            fields: Vec::new(),
            entries: BTreeMap::new(),
            next_id: 1,
            group_cache: HashMap::new(),
            observers: Vec::new(),
            batch_depth: 0,
            batch_dirty: false,
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn set_title(&mut self, title: &str) {
        self.title = title.to_string();
    }

    // ── Fields ─────────────────────────────────────────────────────

    /// The schema in declaration order.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    /// Append a new field to the schema.
    pub fn add_field(&mut self, field: Field) -> Result<()> {
        if self.has_field(&field.name) {
            return Err(ColligoError::Schema(format!(
                "Field '{}' already exists",
                field.name
            )));
        }
        self.fields.push(field);
        self.invalidate_groups();
        self.notify(ChangeNotice::Structural);
        Ok(())
    }

    /// Replace a field definition by name, keeping its position in the
    /// schema order. Appends the field if no definition with that name
    /// exists (used when undo restores a removed field).
    pub fn modify_field(&mut self, field: Field) {
        match self.fields.iter_mut().find(|f| f.name == field.name) {
            Some(slot) => *slot = field,
            None => self.fields.push(field),
        }
        self.invalidate_groups();
        self.notify(ChangeNotice::Structural);
    }

    /// Remove a field from the schema. Every entry's value for the field
    /// is cleared first, so callers removing entries as well should remove
    /// the entries before the field. Fields flagged no_delete are refused
    /// unless `force` is set.
    pub fn remove_field(&mut self, name: &str, force: bool) -> Result<Field> {
        let pos = self
            .fields
            .iter()
            .position(|f| f.name == name)
            .ok_or_else(|| ColligoError::Schema(format!("Field '{name}' not found")))?;
        if self.fields[pos].flags.no_delete && !force {
            return Err(ColligoError::Schema(format!(
                "Field '{name}' cannot be deleted"
            )));
        }
        for entry in self.entries.values_mut() {
            entry.set_value(name, "");
        }
        let field = self.fields.remove(pos);
        self.invalidate_groups();
        self.notify(ChangeNotice::Structural);
        Ok(field)
    }

    /// All Image-typed fields, in schema order.
    pub fn image_fields(&self) -> Vec<&Field> {
        self.fields
            .iter()
            .filter(|f| f.field_type == FieldType::Image)
            .collect()
    }

    /// The fields a derived field's value depends on, in template order.
    /// Fields named in the template but absent from the schema are skipped.
    pub fn field_depends_on(&self, field: &Field) -> Vec<&Field> {
        field
            .template_fields()
            .iter()
            .filter_map(|name| self.field(name))
            .collect()
    }

    /// Compute the formatted value of a derived field for an entry by
    /// substituting %{name} references. Nested derived fields resolve up
    /// to a fixed depth to break reference cycles.
    pub fn derived_value(&self, entry: &Entry, field: &Field) -> String {
        self.derived_value_impl(entry, field, 0)
    }

    fn derived_value_impl(&self, entry: &Entry, field: &Field, depth: u8) -> String {
        const MAX_DEPTH: u8 = 8;
        let template = match field.template() {
            Some(t) => t,
            None => return entry.value(&field.name).to_string(),
        };
        let mut out = String::with_capacity(template.len());
        let mut rest = template;
        while let Some(start) = rest.find("%{") {
            out.push_str(&rest[..start]);
            match rest[start..].find('}') {
                Some(end) => {
                    let name = &rest[start + 2..start + end];
                    if depth < MAX_DEPTH && name != field.name {
                        match self.field(name) {
                            Some(f) if f.is_derived() => {
                                out.push_str(&self.derived_value_impl(entry, f, depth + 1))
                            }
                            _ => out.push_str(entry.value(name)),
                        }
                    }
                    rest = &rest[start + end + 1..];
                }
                None => {
                    out.push_str(&rest[start..]);
                    rest = "";
                }
            }
        }
        out.push_str(rest);
        out.trim().to_string()
    }

    // ── Entries ────────────────────────────────────────────────────

    pub fn entry(&self, id: EntryId) -> Option<&Entry> {
        self.entries.get(&id)
    }

    pub fn entries(&self) -> impl Iterator<Item = &Entry> {
        self.entries.values()
    }

    pub fn entry_ids(&self) -> Vec<EntryId> {
        self.entries.keys().copied().collect()
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Adopt an entry into this collection. The entry keeps its id when it
    /// is nonzero and unused; otherwise a fresh id is assigned.
    pub fn add_entry(&mut self, entry: Entry) -> EntryId {
        let id = self.adopt(entry);
        self.invalidate_groups();
        self.notify(ChangeNotice::Structural);
        id
    }

    /// Bulk-append entries with a single change notice.
    pub fn add_entries(&mut self, entries: Vec<Entry>) -> Vec<EntryId> {
        if entries.is_empty() {
            return Vec::new();
        }
        let ids = entries.into_iter().map(|e| self.adopt(e)).collect();
        self.invalidate_groups();
        self.notify(ChangeNotice::Structural);
        ids
    }

    fn adopt(&mut self, mut entry: Entry) -> EntryId {
        let id = if entry.id() != 0 && !self.entries.contains_key(&entry.id()) {
            entry.id()
        } else {
            while self.entries.contains_key(&self.next_id) {
                self.next_id += 1;
            }
            let id = self.next_id;
            entry.set_id(id);
            id
        };
        self.next_id = self.next_id.max(id + 1);
        self.entries.insert(id, entry);
        id
    }

    /// Remove entries by id. Unknown ids are ignored.
    pub fn remove_entries(&mut self, ids: &[EntryId]) {
        let mut removed = false;
        for id in ids {
            removed |= self.entries.remove(id).is_some();
        }
        if removed {
            self.invalidate_groups();
            self.notify(ChangeNotice::Structural);
        }
    }

    /// Set one field value on one entry.
    pub fn set_entry_value(&mut self, id: EntryId, field_name: &str, value: &str) -> Result<()> {
        let entry = self
            .entries
            .get_mut(&id)
            .ok_or(ColligoError::EntryNotFound(id))?;
        entry.set_value(field_name, value);
        self.invalidate_groups();
        self.notify(ChangeNotice::EntriesChanged);
        Ok(())
    }

    // ── Grouping index ─────────────────────────────────────────────

    /// Entries grouped by their value for a field. Multiple-value fields
    /// contribute the entry to every value's group; entries with no value
    /// are omitted. The result is cached until the next change.
    pub fn entry_group(&mut self, field_name: &str) -> Option<&BTreeMap<String, Vec<EntryId>>> {
        let field = self.field(field_name)?.clone();
        if !self.group_cache.contains_key(field_name) {
            let mut groups: BTreeMap<String, Vec<EntryId>> = BTreeMap::new();
            for (id, entry) in &self.entries {
                for value in entry.values_of(&field) {
                    groups.entry(value).or_default().push(*id);
                }
            }
            self.group_cache.insert(field_name.to_string(), groups);
        }
        self.group_cache.get(field_name)
    }

    fn invalidate_groups(&mut self) {
        self.group_cache.clear();
    }

    // ── Observers and batching ─────────────────────────────────────

    /// Register an observer. Notices arrive on the returned channel;
    /// dropping the receiver unregisters it.
    pub fn subscribe(&mut self) -> mpsc::Receiver<ChangeNotice> {
        let (tx, rx) = mpsc::channel();
        self.observers.push(tx);
        rx
    }

    /// Suspend change notices. Batches nest; the outermost `end_batch`
    /// emits at most one structural notice for the whole scope.
    pub fn begin_batch(&mut self) {
        self.batch_depth += 1;
    }

    pub fn end_batch(&mut self) {
        debug_assert!(self.batch_depth > 0, "end_batch without begin_batch");
        self.batch_depth = self.batch_depth.saturating_sub(1);
        if self.batch_depth == 0 && self.batch_dirty {
            self.batch_dirty = false;
            self.notify(ChangeNotice::Structural);
        }
    }

    fn notify(&mut self, notice: ChangeNotice) {
        if self.batch_depth > 0 {
            self.batch_dirty = true;
            return;
        }
        self.observers.retain(|tx| tx.send(notice).is_ok());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::field::PROP_TEMPLATE;

    fn book_collection() -> Collection {
        let mut coll = Collection::new("Books");
        coll.add_field(Field::new("title", "Title", FieldType::Line)).unwrap();
        coll.add_field(Field::new("author", "Author", FieldType::Line)).unwrap();
        coll.add_field(Field::new("year", "Year", FieldType::Number)).unwrap();
        coll
    }

    fn entry(values: &[(&str, &str)]) -> Entry {
        let mut e = Entry::new(0);
        for (k, v) in values {
            e.set_value(k, v);
        }
        e
    }

    #[test]
    fn test_add_field_rejects_duplicate() {
        let mut coll = book_collection();
        let result = coll.add_field(Field::new("title", "Title", FieldType::Line));
        assert!(result.is_err());
    }

    #[test]
    fn test_entry_ids_are_stable_and_unique() {
        let mut coll = book_collection();
        let a = coll.add_entry(entry(&[("title", "Dune")]));
        let b = coll.add_entry(entry(&[("title", "Hyperion")]));
        assert_ne!(a, b);
        assert_eq!(coll.entry(a).unwrap().title(), "Dune");

        // an adopted entry with a colliding id gets a fresh one
        let mut clash = entry(&[("title", "Foundation")]);
        clash.set_id(a);
        let c = coll.add_entry(clash);
        assert_ne!(c, a);
        assert_eq!(coll.entry_count(), 3);
    }

    #[test]
    fn test_remove_field_clears_entry_values() {
        let mut coll = book_collection();
        let id = coll.add_entry(entry(&[("title", "Dune"), ("year", "1965")]));
        coll.remove_field("year", false).unwrap();
        assert!(!coll.has_field("year"));
        assert_eq!(coll.entry(id).unwrap().value("year"), "");
    }

    #[test]
    fn test_remove_field_respects_no_delete() {
        let mut coll = book_collection();
        let mut keeper = Field::new("keeper", "Keeper", FieldType::Line);
        keeper.flags.no_delete = true;
        coll.add_field(keeper).unwrap();
        assert!(coll.remove_field("keeper", false).is_err());
        assert!(coll.remove_field("keeper", true).is_ok());
    }

    #[test]
    fn test_grouping_splits_multiple_values() {
        let mut coll = book_collection();
        let mut genre = Field::new("genre", "Genre", FieldType::Line);
        genre.flags.allow_multiple = true;
        genre.flags.allow_grouped = true;
        coll.add_field(genre).unwrap();
        let a = coll.add_entry(entry(&[("title", "Dune"), ("genre", "SF; Classic")]));
        let b = coll.add_entry(entry(&[("title", "Hyperion"), ("genre", "SF")]));

        let groups = coll.entry_group("genre").unwrap();
        assert_eq!(groups["SF"], vec![a, b]);
        assert_eq!(groups["Classic"], vec![a]);
    }

    #[test]
    fn test_group_cache_invalidated_on_change() {
        let mut coll = book_collection();
        let a = coll.add_entry(entry(&[("title", "Dune"), ("author", "Herbert")]));
        assert_eq!(coll.entry_group("author").unwrap().len(), 1);
        coll.set_entry_value(a, "author", "Simmons").unwrap();
        let groups = coll.entry_group("author").unwrap();
        assert!(groups.contains_key("Simmons"));
        assert!(!groups.contains_key("Herbert"));
    }

    #[test]
    fn test_derived_value_substitution() {
        let mut coll = book_collection();
        let mut ident = Field::new("ident", "Identifier", FieldType::Dependent);
        ident.set_property(PROP_TEMPLATE, "%{author} (%{year})");
        coll.add_field(ident).unwrap();
        let id = coll.add_entry(entry(&[("author", "Herbert"), ("year", "1965")]));
        let field = coll.field("ident").unwrap().clone();
        let entry = coll.entry(id).unwrap();
        assert_eq!(coll.derived_value(entry, &field), "Herbert (1965)");
    }

    #[test]
    fn test_derived_value_cycle_is_bounded() {
        let mut coll = Collection::new("Loop");
        let mut a = Field::new("a", "A", FieldType::Dependent);
        a.set_property(PROP_TEMPLATE, "%{b}");
        let mut b = Field::new("b", "B", FieldType::Dependent);
        b.set_property(PROP_TEMPLATE, "%{a}");
        coll.add_field(a).unwrap();
        coll.add_field(b).unwrap();
        let id = coll.add_entry(Entry::new(0));
        let field = coll.field("a").unwrap().clone();
        // must terminate; the resolved value is empty
        assert_eq!(coll.derived_value(coll.entry(id).unwrap(), &field), "");
    }

    #[test]
    fn test_batch_coalesces_notices() {
        let mut coll = book_collection();
        let rx = coll.subscribe();

        coll.begin_batch();
        coll.add_entry(entry(&[("title", "Dune")]));
        coll.add_entry(entry(&[("title", "Hyperion")]));
        coll.add_field(Field::new("isbn", "ISBN", FieldType::Line)).unwrap();
        coll.end_batch();

        let notices: Vec<_> = rx.try_iter().collect();
        assert_eq!(notices, vec![ChangeNotice::Structural]);
    }

    #[test]
    fn test_nested_batches_emit_once() {
        let mut coll = book_collection();
        let rx = coll.subscribe();
        coll.begin_batch();
        coll.begin_batch();
        coll.add_entry(entry(&[("title", "Dune")]));
        coll.end_batch();
        assert_eq!(rx.try_iter().count(), 0);
        coll.end_batch();
        assert_eq!(rx.try_iter().count(), 1);
    }

    #[test]
    fn test_bulk_append_single_notice() {
        let mut coll = book_collection();
        let rx = coll.subscribe();
        coll.add_entries(vec![
            entry(&[("title", "Dune")]),
            entry(&[("title", "Hyperion")]),
            entry(&[("title", "Foundation")]),
        ]);
        assert_eq!(rx.try_iter().count(), 1);
        assert_eq!(coll.entry_count(), 3);
    }
}
