// The document owns the live collection and mediates every bulk mutation:
// importer-driven opens, append/merge with undo support, loan bookkeeping
// and image cache maintenance. All bulk work runs in a batch scope so
// observers see one structural notice per operation.

use crate::collection::{ChangeNotice, Collection};
use crate::entry::{Entry, EntryId};
use crate::error::Result;
use crate::images::{CancelToken, ImageProvider, ImageSink};
use crate::merge::{self, MergeReport, Resolver};
use crate::schema::{Field, FieldType};
use serde_json::json;
use std::collections::BTreeSet;
use std::sync::mpsc;

/// Source of a complete collection: a file importer, a fetch result, a
/// network sync payload.
pub trait Importer {
    fn collection(&mut self) -> Result<Collection>;
}

/// Snapshot of the schema taken before a merge or append, required to
/// undo it.
#[derive(Debug, Clone)]
pub struct SchemaSnapshot {
    fields: Vec<Field>,
}

/// The open catalog document.
pub struct Document {
    collection: Collection,
    modified: bool,
}

impl Document {
    /// A new document holding an empty collection.
    pub fn new(title: &str) -> Self {
        Document {
            collection: Collection::new(title),
            modified: false,
        }
    }

    /// Open a document from an importer, replacing nothing.
    pub fn open(importer: &mut dyn Importer) -> Result<Self> {
        let collection = importer.collection()?;
        log::info!(
            "opened collection '{}' with {} entries",
            collection.title(),
            collection.entry_count()
        );
        Ok(Document { collection, modified: false })
    }

    /// Replace the current collection wholesale. Observers of the old
    /// collection are dropped with it.
    pub fn replace(&mut self, collection: Collection) {
        self.collection = collection;
        self.modified = false;
    }

    pub fn collection(&self) -> &Collection {
        &self.collection
    }

    pub fn collection_mut(&mut self) -> &mut Collection {
        self.modified = true;
        &mut self.collection
    }

    /// Whether the document has unsaved changes.
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// Mark the document saved.
    pub fn set_saved(&mut self) {
        self.modified = false;
    }

    pub fn is_empty(&self) -> bool {
        self.collection.fields().is_empty() && self.collection.is_empty()
    }

    pub fn subscribe(&mut self) -> mpsc::Receiver<ChangeNotice> {
        self.collection.subscribe()
    }

    /// Capture the schema for a later undo of an append or merge.
    pub fn schema_snapshot(&self) -> SchemaSnapshot {
        SchemaSnapshot { fields: self.collection.fields().to_vec() }
    }

    // ── Append / merge / undo ──────────────────────────────────────

    /// Append every entry of another collection, without matching.
    /// Returns the created entry ids for [`Document::un_append`].
    pub fn append(&mut self, incoming: &Collection) -> Result<Vec<EntryId>> {
        let added = merge::append_collection(&mut self.collection, incoming)?;
        if !added.is_empty() {
            self.modified = true;
        }
        Ok(added)
    }

    /// De-duplicating merge of another collection.
    /// The report feeds [`Document::un_merge`].
    pub fn merge(
        &mut self,
        incoming: &Collection,
        resolver: Option<&mut dyn Resolver>,
    ) -> Result<MergeReport> {
        let report = merge::merge_collection(&mut self.collection, incoming, resolver)?;
        if report.changed() {
            self.modified = true;
        }
        if report.cancelled {
            log::info!("merge cancelled after {} changes", report.changes.len());
        }
        Ok(report)
    }

    /// Undo an append: the snapshot must predate it.
    pub fn un_append(&mut self, snapshot: &SchemaSnapshot, added: &[EntryId]) -> Result<()> {
        merge::un_append_collection(&mut self.collection, &snapshot.fields, added)?;
        self.modified = true;
        Ok(())
    }

    /// Undo a merge: the snapshot must predate it. A report from a
    /// cancelled merge undoes the partial changes it records.
    pub fn un_merge(&mut self, snapshot: &SchemaSnapshot, report: &MergeReport) -> Result<()> {
        merge::un_merge_collection(&mut self.collection, &snapshot.fields, report)?;
        self.modified = true;
        Ok(())
    }

    // ── Loans ──────────────────────────────────────────────────────

    /// Mark an entry as checked out. Creates the loan-state field on
    /// first use; the field is personal bookkeeping and never counts
    /// toward entry matching.
    pub fn check_out_entry(&mut self, id: EntryId) -> Result<()> {
        self.ensure_loaned_field()?;
        self.collection.set_entry_value(id, "loaned", "true")?;
        self.modified = true;
        Ok(())
    }

    /// Clear an entry's checked-out mark.
    pub fn check_in_entry(&mut self, id: EntryId) -> Result<()> {
        if self.collection.has_field("loaned") {
            self.collection.set_entry_value(id, "loaned", "")?;
            self.modified = true;
        }
        Ok(())
    }

    fn ensure_loaned_field(&mut self) -> Result<()> {
        if self.collection.has_field("loaned") {
            return Ok(());
        }
        let mut field = Field::new("loaned", "Loaned", FieldType::Bool);
        field.category = "Personal".to_string();
        field.flags.allow_grouped = true;
        self.collection.add_field(field)
    }

    // ── Queries ────────────────────────────────────────────────────

    /// Ids of the entries satisfying a predicate, in id order.
    pub fn filtered_entries<P>(&self, predicate: P) -> Vec<EntryId>
    where
        P: Fn(&Entry) -> bool,
    {
        self.collection
            .entries()
            .filter(|e| predicate(e))
            .map(|e| e.id())
            .collect()
    }

    /// A machine-readable status summary.
    pub fn status(&self) -> serde_json::Value {
        json!({
            "title": self.collection.title(),
            "fields": self.collection.fields().len(),
            "entries": self.collection.entry_count(),
            "modified": self.modified,
        })
    }

    // ── Images ─────────────────────────────────────────────────────

    /// Every distinct image id referenced by the collection's entries,
    /// in first-reference order per field.
    pub fn image_ids(&self) -> Vec<String> {
        let image_fields = self.collection.image_fields();
        let mut seen = BTreeSet::new();
        let mut ids = Vec::new();
        for entry in self.collection.entries() {
            for field in &image_fields {
                let id = entry.value(&field.name);
                if !id.is_empty() && seen.insert(id.to_string()) {
                    ids.push(id.to_string());
                }
            }
        }
        ids
    }

    /// How many distinct images the collection references.
    pub fn image_count(&self) -> usize {
        self.image_ids().len()
    }

    /// Write every referenced image to a sink, typically ahead of a save.
    /// Link-only images are skipped. Cancellation is cooperative and
    /// checked between images; images already written stay written.
    /// Returns false when the token cancelled the loop.
    pub fn write_all_images(
        &self,
        provider: &dyn ImageProvider,
        sink: &mut dyn ImageSink,
        token: &CancelToken,
    ) -> Result<bool> {
        for id in self.image_ids() {
            if token.is_cancelled() {
                log::info!("image writing cancelled");
                return Ok(false);
            }
            match provider.info(&id) {
                Some(info) if info.link_only => continue,
                Some(_) => {
                    if let Err(err) = sink.write(&id) {
                        log::warn!("failed to write image {id}: {err}");
                    }
                }
                None => log::warn!("image {id} not in cache, skipping"),
            }
        }
        Ok(true)
    }

    /// Clear entry values that reference images missing from the cache.
    /// Returns true when anything was cleared.
    pub fn prune_images(&mut self, provider: &dyn ImageProvider) -> Result<bool> {
        let image_fields: Vec<String> = self
            .collection
            .image_fields()
            .iter()
            .map(|f| f.name.clone())
            .collect();
        let mut stale: Vec<(EntryId, String)> = Vec::new();
        for entry in self.collection.entries() {
            for name in &image_fields {
                let id = entry.value(name);
                if !id.is_empty() && provider.info(id).is_none() {
                    stale.push((entry.id(), name.clone()));
                }
            }
        }
        if stale.is_empty() {
            return Ok(false);
        }
        self.collection.begin_batch();
        for (id, field) in &stale {
            log::info!("pruning missing image reference on entry {id}");
            self.collection.set_entry_value(*id, field, "")?;
        }
        self.collection.end_batch();
        self.modified = true;
        Ok(true)
    }
}
