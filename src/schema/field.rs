use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Names of the per-entry bookkeeping fields that are never merged.
pub const RESERVED_FIELDS: [&str; 3] = ["id", "cdate", "mdate"];

/// Property key marking a field as a Library of Congress call number.
pub const PROP_LCC: &str = "lcc";

/// Property key marking a field as a strong identifier (ISBN-like) for
/// entry matching.
pub const PROP_IDENTIFIER: &str = "identifier";

/// Property key holding the value template of a derived field,
/// e.g. `"%{title} %{year}"`.
pub const PROP_TEMPLATE: &str = "template";

/// Field type enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    #[default]
    Line,
    Para,
    Choice,
    Bool,
    Number,
    Url,
    Table,
    Image,
    Date,
    Rating,
    Dependent,
}

/// How a field's value is formatted for display and comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormatType {
    #[default]
    None,
    Title,
    Name,
    Date,
    Plain,
}

/// Behavior flags for a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FieldFlags {
    #[serde(default)]
    pub allow_multiple: bool,
    #[serde(default)]
    pub allow_grouped: bool,
    #[serde(default)]
    pub no_delete: bool,
    #[serde(default)]
    pub derived: bool,
}

/// Schema descriptor for one column of a collection.
/// The name is the stable key; it never changes once entries reference it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    #[serde(default)]
    pub title: String,
    #[serde(rename = "type", default)]
    pub field_type: FieldType,
    #[serde(default)]
    pub flags: FieldFlags,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub format: FormatType,
    /// Declared allowed-value list; only meaningful for Choice fields.
    /// Order is significant — it defines the ordinal used for comparison.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed: Vec<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub properties: HashMap<String, String>,
}

impl Field {
    /// Create a field with the given name, display title, and type.
    pub fn new(name: &str, title: &str, field_type: FieldType) -> Self {
        Field {
            name: name.to_string(),
            title: title.to_string(),
            field_type,
            flags: FieldFlags::default(),
            category: String::new(),
            format: FormatType::None,
            allowed: Vec::new(),
            properties: HashMap::new(),
        }
    }

    /// Create a Choice field with its allowed-value list.
    pub fn new_choice(name: &str, title: &str, allowed: &[&str]) -> Self {
        let mut f = Field::new(name, title, FieldType::Choice);
        f.allowed = allowed.iter().map(|s| s.to_string()).collect();
        f
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(|s| s.as_str())
    }

    pub fn set_property(&mut self, key: &str, value: &str) {
        self.properties.insert(key.to_string(), value.to_string());
    }

    /// Whether the field's formatted value is computed from other fields.
    pub fn is_derived(&self) -> bool {
        self.flags.derived || self.field_type == FieldType::Dependent
    }

    /// The value template of a derived field, if any.
    pub fn template(&self) -> Option<&str> {
        self.property(PROP_TEMPLATE)
    }

    /// Field names referenced by this field's template, in template order.
    pub fn template_fields(&self) -> Vec<String> {
        let template = match self.template() {
            Some(t) => t,
            None => return Vec::new(),
        };
        // %{field} references, first occurrence wins
        let re = Regex::new(r"%\{([^}]+)\}").expect("template regex");
        let mut names = Vec::new();
        for cap in re.captures_iter(template) {
            let name = cap[1].to_string();
            if name != self.name && !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }

    /// Whether this is one of the bookkeeping fields (id, cdate, mdate)
    /// that stay unique to each entry and are excluded from merging.
    pub fn is_reserved(&self) -> bool {
        RESERVED_FIELDS.contains(&self.name.as_str())
    }
}
