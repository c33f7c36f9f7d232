//! Extension-based file classification.
//!
//! A [`CategoryTable`] maps category names (which double as destination folder
//! names) to sets of file extensions. Lookup walks the table in insertion order
//! and the first category that lists the extension wins; anything unknown falls
//! back to [`FALLBACK_CATEGORY`].
//!
//! # Examples
//!
//! ```
//! use filesort::category::CategoryTable;
//!
//! let table = CategoryTable::default();
//! assert_eq!(table.classify(".pdf"), "Documents");
//! assert_eq!(table.classify("JPG"), "Images");
//! assert_eq!(table.classify(".unknown"), "Misc");
//! ```

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

/// Category used for any extension the table does not list.
pub const FALLBACK_CATEGORY: &str = "Misc";

/// Category recorded for files redirected by the quarantine duplicate policy.
pub const DUPLICATES_CATEGORY: &str = "duplicates";

/// Ordered mapping from category name to the extensions it claims.
///
/// Extensions are stored lower-cased with a leading dot. The table may list
/// the same extension under several categories; [`CategoryTable::classify`]
/// then returns whichever category was inserted first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    from = "IndexMap<String, Vec<String>>",
    into = "IndexMap<String, Vec<String>>"
)]
pub struct CategoryTable {
    categories: IndexMap<String, IndexSet<String>>,
}

impl CategoryTable {
    /// Creates an empty table. Every lookup on it yields [`FALLBACK_CATEGORY`].
    pub fn empty() -> Self {
        Self {
            categories: IndexMap::new(),
        }
    }

    /// Adds `extensions` to `category`, creating the category at the end of
    /// the table if it does not exist yet.
    pub fn add_extensions<I, S>(&mut self, category: &str, extensions: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let entry = self.categories.entry(category.to_string()).or_default();
        entry.extend(
            extensions
                .into_iter()
                .filter_map(|ext| normalize_extension(ext.as_ref())),
        );
    }

    /// Replaces the extension set of `category`.
    ///
    /// An existing category keeps its position in the table; a new one is
    /// appended.
    pub fn set_category<I, S>(&mut self, category: &str, extensions: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let normalized: IndexSet<String> = extensions
            .into_iter()
            .filter_map(|ext| normalize_extension(ext.as_ref()))
            .collect();
        self.categories.insert(category.to_string(), normalized);
    }

    /// Removes a category, preserving the order of the remaining ones.
    pub fn remove_category(&mut self, category: &str) -> bool {
        self.categories.shift_remove(category).is_some()
    }

    /// Returns the category for `extension`.
    ///
    /// The extension is matched case-insensitively and may be given with or
    /// without its leading dot. Never fails: unknown and empty extensions map
    /// to [`FALLBACK_CATEGORY`].
    ///
    /// # Examples
    ///
    /// ```
    /// use filesort::category::CategoryTable;
    ///
    /// let mut table = CategoryTable::empty();
    /// table.add_extensions("Books", [".epub"]);
    /// assert_eq!(table.classify(".EPUB"), "Books");
    /// assert_eq!(table.classify(".mobi"), "Misc");
    /// ```
    pub fn classify(&self, extension: &str) -> &str {
        let Some(needle) = normalize_extension(extension) else {
            return FALLBACK_CATEGORY;
        };

        self.categories
            .iter()
            .find(|(_, extensions)| extensions.contains(&needle))
            .map(|(name, _)| name.as_str())
            .unwrap_or(FALLBACK_CATEGORY)
    }

    /// Iterates categories in table order.
    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.categories.keys().map(String::as_str)
    }

    /// Returns the extensions listed under `category`, in insertion order.
    pub fn extensions(&self, category: &str) -> Option<impl Iterator<Item = &str>> {
        self.categories
            .get(category)
            .map(|set| set.iter().map(String::as_str))
    }

    /// Number of categories, including ones with no extensions.
    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}

impl Default for CategoryTable {
    /// The stock table: documents, images, videos, audio, archives,
    /// installers, code, spreadsheets and an empty `Misc` bucket.
    fn default() -> Self {
        let mut table = Self::empty();
        table.add_extensions(
            "Documents",
            [
                ".pdf", ".docx", ".txt", ".rtf", ".odt", ".pptx", ".xlsx", ".csv", ".doc", ".ppt",
            ],
        );
        table.add_extensions(
            "Images",
            [
                ".jpg", ".jpeg", ".png", ".gif", ".bmp", ".tiff", ".webp", ".svg", ".ico",
            ],
        );
        table.add_extensions(
            "Videos",
            [".mp4", ".mov", ".avi", ".mkv", ".flv", ".wmv", ".m4v", ".webm"],
        );
        table.add_extensions(
            "Audio",
            [".mp3", ".wav", ".flac", ".aac", ".ogg", ".m4a", ".wma"],
        );
        table.add_extensions(
            "Archives",
            [".zip", ".rar", ".7z", ".tar", ".gz", ".bz2", ".xz"],
        );
        table.add_extensions(
            "Installers",
            [".exe", ".msi", ".bat", ".cmd", ".appx", ".msix"],
        );
        table.add_extensions(
            "Code",
            [
                ".py", ".cpp", ".c", ".h", ".js", ".html", ".css", ".java", ".json", ".xml", ".ts",
                ".php", ".rb", ".go",
            ],
        );
        table.add_extensions("Spreadsheets", [".xls", ".xlsx", ".ods", ".csv"]);
        table.add_extensions(FALLBACK_CATEGORY, std::iter::empty::<&str>());
        table
    }
}

impl From<IndexMap<String, Vec<String>>> for CategoryTable {
    fn from(raw: IndexMap<String, Vec<String>>) -> Self {
        let mut table = Self::empty();
        for (category, extensions) in raw {
            table.set_category(&category, extensions);
        }
        table
    }
}

impl From<CategoryTable> for IndexMap<String, Vec<String>> {
    fn from(table: CategoryTable) -> Self {
        table
            .categories
            .into_iter()
            .map(|(name, set)| (name, set.into_iter().collect()))
            .collect()
    }
}

/// Lower-cases an extension and gives it a leading dot.
///
/// Returns `None` for an empty extension (or a lone `.`).
pub fn normalize_extension(extension: &str) -> Option<String> {
    let trimmed = extension.trim().trim_start_matches('.');
    if trimmed.is_empty() {
        return None;
    }
    Some(format!(".{}", trimmed.to_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_table() -> CategoryTable {
        let mut table = CategoryTable::empty();
        table.add_extensions("Documents", [".pdf"]);
        table.add_extensions("Images", [".jpg"]);
        table
    }

    #[test]
    fn test_classify_known_extension() {
        let table = small_table();
        assert_eq!(table.classify(".pdf"), "Documents");
        assert_eq!(table.classify(".jpg"), "Images");
    }

    #[test]
    fn test_classify_is_case_insensitive() {
        let table = small_table();
        assert_eq!(table.classify(".PDF"), table.classify(".pdf"));
        assert_eq!(table.classify(".Jpg"), "Images");
    }

    #[test]
    fn test_classify_accepts_missing_dot() {
        let table = small_table();
        assert_eq!(table.classify("pdf"), "Documents");
    }

    #[test]
    fn test_classify_unknown_falls_back_to_misc() {
        let table = small_table();
        assert_eq!(table.classify(".xyz"), FALLBACK_CATEGORY);
        assert_eq!(table.classify(""), FALLBACK_CATEGORY);
        assert_eq!(CategoryTable::empty().classify(".pdf"), FALLBACK_CATEGORY);
    }

    #[test]
    fn test_first_category_wins_on_overlap() {
        let table = CategoryTable::default();
        // .csv and .xlsx are listed under both Documents and Spreadsheets
        assert_eq!(table.classify(".csv"), "Documents");
        assert_eq!(table.classify(".xlsx"), "Documents");
        assert_eq!(table.classify(".ods"), "Spreadsheets");
    }

    #[test]
    fn test_default_table_order() {
        let table = CategoryTable::default();
        let names: Vec<_> = table.categories().collect();
        assert_eq!(
            names,
            vec![
                "Documents",
                "Images",
                "Videos",
                "Audio",
                "Archives",
                "Installers",
                "Code",
                "Spreadsheets",
                "Misc"
            ]
        );
    }

    #[test]
    fn test_extensions_are_normalized_on_insert() {
        let mut table = CategoryTable::empty();
        table.add_extensions("Books", ["EPUB", ".Mobi", "", "."]);
        let exts: Vec<_> = table.extensions("Books").unwrap().collect();
        assert_eq!(exts, vec![".epub", ".mobi"]);
    }

    #[test]
    fn test_set_category_keeps_position() {
        let mut table = small_table();
        table.set_category("Documents", [".txt"]);
        let names: Vec<_> = table.categories().collect();
        assert_eq!(names, vec!["Documents", "Images"]);
        assert_eq!(table.classify(".txt"), "Documents");
        assert_eq!(table.classify(".pdf"), FALLBACK_CATEGORY);
    }

    #[test]
    fn test_remove_category() {
        let mut table = small_table();
        assert!(table.remove_category("Documents"));
        assert!(!table.remove_category("Documents"));
        assert_eq!(table.classify(".pdf"), FALLBACK_CATEGORY);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_deserialize_preserves_order() {
        let toml_src = r#"
Zeta = [".z"]
Alpha = ["A", ".z"]
"#;
        let table: CategoryTable = toml::from_str(toml_src).unwrap();
        let names: Vec<_> = table.categories().collect();
        assert_eq!(names, vec!["Zeta", "Alpha"]);
        assert_eq!(table.classify(".z"), "Zeta");
        assert_eq!(table.classify(".a"), "Alpha");
    }
}
