// Value formatting rules shared by entries, comparison, and merging.
// Multi-valued fields join their values with VALUE_DELIMITER; table fields
// store rows joined by ROW_DELIMITER, each row's columns joined by
// COLUMN_DELIMITER.

/// Separator between the values of a multiple-value field.
pub const VALUE_DELIMITER: &str = "; ";

/// Separator between the rows of a table field.
pub const ROW_DELIMITER: &str = "\n";

/// Separator between the columns of one table row.
pub const COLUMN_DELIMITER: &str = "::";

/// Leading articles stripped (case-insensitively) before title comparison.
pub const DEFAULT_ARTICLES: [&str; 3] = ["the", "a", "an"];

/// Split a multiple-value field into its values.
pub fn split_values(value: &str) -> Vec<String> {
    if value.is_empty() {
        return Vec::new();
    }
    value.split(VALUE_DELIMITER).map(|s| s.to_string()).collect()
}

/// Split a table field value into rows.
pub fn split_table(value: &str) -> Vec<String> {
    if value.is_empty() {
        return Vec::new();
    }
    value.split(ROW_DELIMITER).map(|s| s.to_string()).collect()
}

/// Split one table row into its columns.
pub fn split_row(row: &str) -> Vec<String> {
    if row.is_empty() {
        return Vec::new();
    }
    row.split(COLUMN_DELIMITER).map(|s| s.to_string()).collect()
}

pub fn join_values(values: &[String]) -> String {
    values.join(VALUE_DELIMITER)
}

pub fn join_table(rows: &[String]) -> String {
    rows.join(ROW_DELIMITER)
}

pub fn join_row(columns: &[String]) -> String {
    columns.join(COLUMN_DELIMITER)
}

/// Strip one leading article ("The ", "A ", ...) from a title.
/// The article must be followed by a space to count. Titles starting
/// with multi-byte characters pass through untouched.
pub fn strip_articles<'a>(title: &'a str, articles: &[String]) -> &'a str {
    for article in articles {
        if title.len() > article.len() + 1
            && title
                .get(..article.len())
                .is_some_and(|prefix| prefix.eq_ignore_ascii_case(article))
            && title[article.len()..].starts_with(' ')
        {
            return title[article.len() + 1..].trim_start();
        }
    }
    title
}

pub fn default_articles() -> Vec<String> {
    DEFAULT_ARTICLES.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_table_and_row() {
        let value = "Track One::3:45\nTrack Two::4:10";
        let rows = split_table(value);
        assert_eq!(rows.len(), 2);
        assert_eq!(split_row(&rows[0]), vec!["Track One", "3:45"]);
        assert_eq!(join_table(&rows), value);
    }

    #[test]
    fn test_split_empty_is_empty() {
        assert!(split_table("").is_empty());
        assert!(split_row("").is_empty());
        assert!(split_values("").is_empty());
    }

    #[test]
    fn test_strip_articles() {
        let articles = default_articles();
        assert_eq!(strip_articles("The Stand", &articles), "Stand");
        assert_eq!(strip_articles("the stand", &articles), "stand");
        assert_eq!(strip_articles("A Tale of Two Cities", &articles), "Tale of Two Cities");
        // no following space, not an article
        assert_eq!(strip_articles("Theory of Games", &articles), "Theory of Games");
        assert_eq!(strip_articles("Another Day", &articles), "Another Day");
    }

    #[test]
    fn test_strip_articles_multibyte_titles() {
        let articles = default_articles();
        // leading multi-byte characters must not be sliced mid-boundary
        assert_eq!(strip_articles("Ёлка и птица", &articles), "Ёлка и птица");
        assert_eq!(strip_articles("Über das Meer", &articles), "Über das Meer");
        assert_eq!(strip_articles("狼と香辛料", &articles), "狼と香辛料");
        // an ASCII article before a multi-byte title still strips
        assert_eq!(strip_articles("The Étranger", &articles), "Étranger");
    }
}
