pub mod field;
pub mod format;

pub use field::{Field, FieldFlags, FieldType, FormatType};
