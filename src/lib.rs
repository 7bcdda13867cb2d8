pub mod schema;
pub mod entry;
pub mod collection;
pub mod compare;
pub mod reconcile;
pub mod merge;
pub mod document;
pub mod images;
pub mod import;
pub mod error;

pub use collection::{ChangeNotice, Collection};
pub use compare::score::{score_entries, ENTRY_GOOD_MATCH, ENTRY_PERFECT_MATCH};
pub use compare::FieldComparison;
pub use document::Document;
pub use entry::{Entry, EntryId};
pub use error::{ColligoError, Result};
pub use merge::{MergeReport, Resolution, Resolver};
pub use schema::{Field, FieldType, FormatType};
