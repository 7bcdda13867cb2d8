// Per-field comparison strategies. The strategy for a field is selected
// from its metadata by a fixed priority chain; the chain order is part of
// the contract, so entries formatted as titles, derived values, call
// numbers, etc. always compare the same way.

pub mod score;
pub mod strings;

use crate::collection::Collection;
use crate::entry::Entry;
use crate::images::ImageProvider;
use crate::schema::field::PROP_LCC;
use crate::schema::{format, Field, FieldType, FormatType};
use std::cmp::Ordering;

/// Shared lookups a comparison may need: the owning collection for derived
/// value resolution and the image collaborator for image metadata.
pub struct CompareContext<'a> {
    pub collection: &'a Collection,
    pub images: &'a dyn ImageProvider,
}

impl<'a> CompareContext<'a> {
    pub fn new(collection: &'a Collection, images: &'a dyn ImageProvider) -> Self {
        CompareContext { collection, images }
    }

    /// The value of a field on an entry, resolving derived templates.
    pub fn value_of(&self, entry: &Entry, field: &Field) -> String {
        if field.is_derived() {
            self.collection.derived_value(entry, field)
        } else {
            entry.value(&field.name).to_string()
        }
    }
}

enum CompareKind {
    Number,
    Bool,
    Rating,
    Image,
    /// Child comparisons for each field the derived value depends on,
    /// tried in dependency order before falling back to the derived
    /// value's own lexical comparison.
    Derived(Vec<FieldComparison>),
    IsoDate,
    Choice,
    Title(Vec<String>),
    Lcc,
    Lexical,
}

/// A comparison strategy bound to one field.
pub struct FieldComparison {
    field: Field,
    kind: CompareKind,
}

impl FieldComparison {
    /// Select the strategy for a field. The priority order is fixed:
    /// number, bool, rating, image, derived, date, choice, title format,
    /// LCC, lexical fallback. Selection is a pure function of field
    /// metadata and never caches.
    pub fn for_field(field: &Field, coll: &Collection) -> Self {
        Self::build(field, coll, &format::default_articles(), 0)
    }

    /// Same as [`FieldComparison::for_field`] with a caller-supplied
    /// leading-article list for title comparison.
    pub fn for_field_with_articles(field: &Field, coll: &Collection, articles: &[String]) -> Self {
        Self::build(field, coll, articles, 0)
    }

    fn build(field: &Field, coll: &Collection, articles: &[String], depth: u8) -> Self {
        // depth bounds mutually-derived fields
        const MAX_DEPTH: u8 = 8;
        let kind = if field.field_type == FieldType::Number {
            CompareKind::Number
        } else if field.field_type == FieldType::Bool {
            CompareKind::Bool
        } else if field.field_type == FieldType::Rating {
            CompareKind::Rating
        } else if field.field_type == FieldType::Image {
            CompareKind::Image
        } else if field.is_derived() && depth < MAX_DEPTH {
            let children = coll
                .field_depends_on(field)
                .into_iter()
                .map(|f| Self::build(f, coll, articles, depth + 1))
                .collect();
            CompareKind::Derived(children)
        } else if field.field_type == FieldType::Date || field.format == FormatType::Date {
            CompareKind::IsoDate
        } else if field.field_type == FieldType::Choice {
            CompareKind::Choice
        } else if field.format == FormatType::Title {
            // a derived value past the depth bound can still format as title
            CompareKind::Title(articles.to_vec())
        } else if field.property(PROP_LCC) == Some("true") || field.name == "lcc" {
            CompareKind::Lcc
        } else {
            CompareKind::Lexical
        };
        FieldComparison { field: field.clone(), kind }
    }

    pub fn field(&self) -> &Field {
        &self.field
    }

    /// Three-way comparison of two formatted values.
    pub fn compare_values(&self, a: &str, b: &str, ctx: &CompareContext) -> Ordering {
        match &self.kind {
            CompareKind::Number | CompareKind::Rating => strings::compare_numbers(a, b),
            CompareKind::Bool => strings::compare_bools(a, b),
            CompareKind::Image => self.compare_images(a, b, ctx),
            CompareKind::IsoDate => strings::compare_iso_dates(a, b),
            CompareKind::Choice => self.compare_choice(a, b),
            CompareKind::Title(articles) => strings::compare_titles(a, b, articles),
            CompareKind::Lcc => strings::compare_lcc(a, b),
            // a derived value compared directly falls back to lexical order
            CompareKind::Derived(_) | CompareKind::Lexical => a.cmp(b),
        }
    }

    /// Three-way comparison of two entries by this field.
    pub fn compare_entries(&self, e1: &Entry, e2: &Entry, ctx: &CompareContext) -> Ordering {
        if let CompareKind::Derived(children) = &self.kind {
            for child in children {
                let res = child.compare_entries(e1, e2, ctx);
                if res != Ordering::Equal {
                    return res;
                }
            }
        }
        let a = ctx.value_of(e1, &self.field);
        let b = ctx.value_of(e2, &self.field);
        self.compare_values(&a, &b, ctx)
    }

    /// Ordinal comparison against the declared allowed-value list.
    /// A value not in the list sorts before all declared values.
    fn compare_choice(&self, a: &str, b: &str) -> Ordering {
        let ord = |v: &str| {
            self.field
                .allowed
                .iter()
                .position(|allowed| allowed == v)
                .map(|i| i as i64)
                .unwrap_or(-1)
        };
        ord(a).cmp(&ord(b))
    }

    /// Empty ids and missing images sort lowest; otherwise the wider image
    /// compares greater.
    fn compare_images(&self, a: &str, b: &str, ctx: &CompareContext) -> Ordering {
        if a.is_empty() || b.is_empty() {
            return (!a.is_empty()).cmp(&!b.is_empty());
        }
        match (ctx.images.info(a), ctx.images.info(b)) {
            (Some(ia), Some(ib)) => ia.width.cmp(&ib.width),
            (Some(_), None) => Ordering::Greater,
            (None, Some(_)) => Ordering::Less,
            (None, None) => Ordering::Equal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::images::{MemoryImages, NoImages};
    use crate::schema::field::PROP_TEMPLATE;

    fn entry(values: &[(&str, &str)]) -> Entry {
        let mut e = Entry::new(0);
        for (k, v) in values {
            e.set_value(k, v);
        }
        e
    }

    fn coll_with(fields: Vec<Field>) -> Collection {
        let mut coll = Collection::new("Test");
        for f in fields {
            coll.add_field(f).unwrap();
        }
        coll
    }

    #[test]
    fn test_selection_prefers_type_over_format() {
        // a Number field formatted as title still compares numerically
        let mut f = Field::new("volume", "Volume", FieldType::Number);
        f.format = FormatType::Title;
        let coll = coll_with(vec![f.clone()]);
        let cmp = FieldComparison::for_field(&f, &coll);
        let ctx = CompareContext::new(&coll, &NoImages);
        assert_eq!(cmp.compare_values("2", "10", &ctx), Ordering::Less);
    }

    #[test]
    fn test_selection_derived_before_date_format() {
        // a derived field whose format is date compares by its
        // dependencies first, not as a date string
        let mut year = Field::new("year", "Year", FieldType::Number);
        year.format = FormatType::Date;
        let mut ident = Field::new("ident", "Identifier", FieldType::Dependent);
        ident.format = FormatType::Date;
        ident.set_property(PROP_TEMPLATE, "%{year}");
        let coll = coll_with(vec![year, ident.clone()]);
        let cmp = FieldComparison::for_field(&ident, &coll);
        let ctx = CompareContext::new(&coll, &NoImages);

        let a = entry(&[("year", "9")]);
        let b = entry(&[("year", "10")]);
        // numeric via the year dependency: 9 < 10; a lexical comparison
        // of the derived value would say the opposite
        assert_eq!(cmp.compare_entries(&a, &b, &ctx), Ordering::Less);
    }

    #[test]
    fn test_choice_ordinal() {
        let f = Field::new_choice("condition", "Condition", &["mint", "good", "poor"]);
        let coll = coll_with(vec![f.clone()]);
        let cmp = FieldComparison::for_field(&f, &coll);
        let ctx = CompareContext::new(&coll, &NoImages);
        assert_eq!(cmp.compare_values("mint", "poor", &ctx), Ordering::Less);
        // unknown value sorts before all declared values
        assert_eq!(cmp.compare_values("unknown", "mint", &ctx), Ordering::Less);
        assert_eq!(cmp.compare_values("unknown", "unknown", &ctx), Ordering::Equal);
    }

    #[test]
    fn test_title_format_comparison() {
        let mut f = Field::new("title", "Title", FieldType::Line);
        f.format = FormatType::Title;
        let coll = coll_with(vec![f.clone()]);
        let cmp = FieldComparison::for_field(&f, &coll);
        let ctx = CompareContext::new(&coll, &NoImages);
        assert_eq!(cmp.compare_values("The Stand", "stand", &ctx), Ordering::Equal);
    }

    #[test]
    fn test_lcc_by_property_or_name() {
        let mut f = Field::new("call_number", "Call Number", FieldType::Line);
        f.set_property(PROP_LCC, "true");
        let coll = coll_with(vec![f.clone()]);
        let cmp = FieldComparison::for_field(&f, &coll);
        let ctx = CompareContext::new(&coll, &NoImages);
        assert_eq!(cmp.compare_values("QA76", "QA141", &ctx), Ordering::Less);

        let f2 = Field::new("lcc", "LCC", FieldType::Line);
        let coll2 = coll_with(vec![f2.clone()]);
        let cmp2 = FieldComparison::for_field(&f2, &coll2);
        let ctx2 = CompareContext::new(&coll2, &NoImages);
        assert_eq!(cmp2.compare_values("QA76", "QA141", &ctx2), Ordering::Less);
    }

    #[test]
    fn test_image_comparison_by_width() {
        let f = Field::new("cover", "Cover", FieldType::Image);
        let coll = coll_with(vec![f.clone()]);
        let mut images = MemoryImages::new();
        images.insert("small", 200, 300);
        images.insert("large", 600, 900);
        let cmp = FieldComparison::for_field(&f, &coll);
        let ctx = CompareContext::new(&coll, &images);

        assert_eq!(cmp.compare_values("small", "large", &ctx), Ordering::Less);
        // empty id sorts lowest
        assert_eq!(cmp.compare_values("", "small", &ctx), Ordering::Less);
        // missing image sorts below a resolvable one
        assert_eq!(cmp.compare_values("missing", "small", &ctx), Ordering::Less);
    }

    #[test]
    fn test_derived_falls_back_to_lexical_value() {
        let title = Field::new("title", "Title", FieldType::Line);
        let mut ident = Field::new("ident", "Identifier", FieldType::Dependent);
        ident.set_property(PROP_TEMPLATE, "%{title}-suffix");
        let coll = coll_with(vec![title, ident.clone()]);
        let cmp = FieldComparison::for_field(&ident, &coll);
        let ctx = CompareContext::new(&coll, &NoImages);

        // dependency (title) equal, so the composed value decides
        let a = entry(&[("title", "Same")]);
        let b = entry(&[("title", "Same")]);
        assert_eq!(cmp.compare_entries(&a, &b, &ctx), Ordering::Equal);
    }

    #[test]
    fn test_default_is_lexical() {
        let f = Field::new("publisher", "Publisher", FieldType::Line);
        let coll = coll_with(vec![f.clone()]);
        let cmp = FieldComparison::for_field(&f, &coll);
        let ctx = CompareContext::new(&coll, &NoImages);
        assert_eq!(cmp.compare_values("Ace", "Tor", &ctx), Ordering::Less);
        // case matters in the lexical fallback
        assert_ne!(cmp.compare_values("ace", "Ace", &ctx), Ordering::Equal);
    }
}
