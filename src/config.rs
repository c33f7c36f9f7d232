//! Configuration loading: category table, organize settings and exclusion
//! filters.
//!
//! Configuration is stored in TOML. Every section and key is optional; anything
//! missing falls back to the built-in defaults.
//!
//! ```toml
//! [settings]
//! recursive = false
//! create_date_folders = false
//! skip_duplicates = false      # true quarantines collisions in duplicates/
//! skip_no_extension = true
//! log_level = "info"
//! replace_categories = false   # true drops the built-in category table
//!
//! [categories]
//! Documents = [".pdf", ".txt"]
//! Ebooks = [".epub", ".mobi"]
//! Installers = []               # an empty list removes a built-in category
//!
//! [filters]
//! skip_hidden = false
//! exclude_filenames = ["Thumbs.db", ".DS_Store"]
//! exclude_patterns = ["**/node_modules/**"]
//! exclude_regex = []
//! ```

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use glob::Pattern;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::category::CategoryTable;
use crate::organizer::{DuplicatePolicy, OrganizeOptions};

/// Name of the per-directory configuration file.
pub const LOCAL_CONFIG_FILE: &str = ".filesortrc.toml";

/// Errors that can occur while loading configuration or compiling filters.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {}", .0.display())]
    ConfigNotFound(PathBuf),

    #[error("Invalid configuration in {}: {reason}", path.display())]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Invalid glob pattern '{pattern}': {reason}")]
    InvalidGlobPattern { pattern: String, reason: String },

    #[error("Invalid regex pattern '{pattern}': {reason}")]
    InvalidRegexPattern { pattern: String, reason: String },

    #[error("IO error reading configuration {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Organize settings as they appear in the `[settings]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Descend into subdirectories of the source.
    pub recursive: bool,
    /// Add a `YYYY-MM-DD` folder under each category.
    pub create_date_folders: bool,
    /// Historical name: `true` sends collisions to `duplicates/`, `false`
    /// renames them in place with a `_N` suffix.
    pub skip_duplicates: bool,
    /// Leave files without an extension where they are.
    pub skip_no_extension: bool,
    /// Default tracing filter when `RUST_LOG` is not set.
    pub log_level: String,
    /// Use only the categories from the file instead of merging them over the
    /// built-in table.
    pub replace_categories: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            recursive: false,
            create_date_folders: false,
            skip_duplicates: false,
            skip_no_extension: true,
            log_level: "info".to_string(),
            replace_categories: false,
        }
    }
}

impl Settings {
    /// The duplicate policy selected by `skip_duplicates`.
    pub fn duplicate_policy(&self) -> DuplicatePolicy {
        if self.skip_duplicates {
            DuplicatePolicy::Quarantine
        } else {
            DuplicatePolicy::RenameUnique
        }
    }

    /// Builds engine options from these settings, without filters.
    pub fn organize_options(&self) -> OrganizeOptions {
        OrganizeOptions {
            recursive: self.recursive,
            create_date_folders: self.create_date_folders,
            duplicate_policy: self.duplicate_policy(),
            skip_no_extension: self.skip_no_extension,
            filters: None,
        }
    }
}

/// Exclusion rules as they appear in the `[filters]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterRules {
    /// Leave dot-files alone.
    pub skip_hidden: bool,
    /// Exact file names to leave alone.
    pub exclude_filenames: Vec<String>,
    /// Glob patterns matched against the path relative to the source root.
    pub exclude_patterns: Vec<String>,
    /// Regular expressions matched against the file name.
    pub exclude_regex: Vec<String>,
}

impl FilterRules {
    /// Compiles these rules for matching.
    ///
    /// # Errors
    ///
    /// Returns an error if any glob or regex pattern is invalid.
    pub fn compile(&self) -> Result<CompiledFilters, ConfigError> {
        CompiledFilters::new(self)
    }

    pub fn is_empty(&self) -> bool {
        !self.skip_hidden
            && self.exclude_filenames.is_empty()
            && self.exclude_patterns.is_empty()
            && self.exclude_regex.is_empty()
    }
}

/// The complete configuration handed to the CLI.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FileSortConfig {
    pub settings: Settings,
    pub categories: CategoryTable,
    pub filters: FilterRules,
}

/// On-disk shape; `categories` stays optional so merging can tell "absent"
/// from "empty".
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawConfig {
    settings: Settings,
    categories: Option<CategoryTable>,
    filters: FilterRules,
}

impl FileSortConfig {
    /// Loads configuration, falling back to defaults.
    ///
    /// Lookup order:
    /// 1. `config_path`, if given (it must exist)
    /// 2. `.filesortrc.toml` in the current directory
    /// 3. `~/.config/filesort/config.toml`
    /// 4. built-in defaults
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = config_path {
            return Self::load_from_file(path);
        }

        let local_config = PathBuf::from(LOCAL_CONFIG_FILE);
        if local_config.exists() {
            return Self::load_from_file(&local_config);
        }

        if let Ok(home) = std::env::var("HOME") {
            let home_config = PathBuf::from(home)
                .join(".config")
                .join("filesort")
                .join("config.toml");
            if home_config.exists() {
                return Self::load_from_file(&home_config);
            }
        }

        Ok(Self::default())
    }

    /// Loads configuration from a specific file.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::ConfigNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        Self::from_toml_str(&content).map_err(|reason| ConfigError::ConfigInvalid {
            path: path.to_path_buf(),
            reason,
        })
    }

    /// Parses TOML text and merges it over the defaults.
    pub fn from_toml_str(content: &str) -> Result<Self, String> {
        let raw: RawConfig = toml::from_str(content).map_err(|e| e.to_string())?;

        let categories = match raw.categories {
            None => CategoryTable::default(),
            Some(user) if raw.settings.replace_categories => user,
            Some(user) => merge_categories(CategoryTable::default(), &user),
        };

        Ok(Self {
            settings: raw.settings,
            categories,
            filters: raw.filters,
        })
    }

    /// Engine options with compiled filters attached.
    pub fn organize_options(&self) -> Result<OrganizeOptions, ConfigError> {
        let mut options = self.settings.organize_options();
        if !self.filters.is_empty() {
            options.filters = Some(self.filters.compile()?);
        }
        Ok(options)
    }
}

/// Overlays `user` on `base`: categories named in both take the user's
/// extensions in the base position, new categories are appended. A category
/// given an empty list is removed.
fn merge_categories(mut base: CategoryTable, user: &CategoryTable) -> CategoryTable {
    for name in user.categories() {
        let extensions: Vec<&str> = user
            .extensions(name)
            .map(|exts| exts.collect())
            .unwrap_or_default();
        if extensions.is_empty() {
            base.remove_category(name);
        } else {
            base.set_category(name, extensions);
        }
    }
    base
}

/// Filter rules compiled once for matching many paths.
#[derive(Debug, Clone, Default)]
pub struct CompiledFilters {
    skip_hidden: bool,
    exclude_filenames: HashSet<String>,
    exclude_patterns: Vec<Pattern>,
    exclude_regexes: Vec<Regex>,
}

impl CompiledFilters {
    fn new(rules: &FilterRules) -> Result<Self, ConfigError> {
        let exclude_patterns = rules
            .exclude_patterns
            .iter()
            .map(|pattern| {
                Pattern::new(pattern).map_err(|e| ConfigError::InvalidGlobPattern {
                    pattern: pattern.clone(),
                    reason: e.msg.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let exclude_regexes = rules
            .exclude_regex
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|e| ConfigError::InvalidRegexPattern {
                    pattern: pattern.clone(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            skip_hidden: rules.skip_hidden,
            exclude_filenames: rules.exclude_filenames.iter().cloned().collect(),
            exclude_patterns,
            exclude_regexes,
        })
    }

    /// Adds an exact file name to leave alone.
    pub fn exclude_filename(&mut self, name: impl Into<String>) {
        self.exclude_filenames.insert(name.into());
    }

    /// Whether a file should be organized.
    ///
    /// `relative_path` is the file's path relative to the source root. Checks
    /// run in order: hidden files, exact name, glob patterns, regexes.
    pub fn should_include(&self, relative_path: &Path) -> bool {
        let file_name = relative_path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default();

        if self.skip_hidden && file_name.starts_with('.') {
            return false;
        }

        if self.exclude_filenames.contains(file_name.as_ref()) {
            return false;
        }

        if self
            .exclude_patterns
            .iter()
            .any(|pattern| pattern.matches_path(relative_path))
        {
            return false;
        }

        !self
            .exclude_regexes
            .iter()
            .any(|regex| regex.is_match(&file_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert!(!settings.recursive);
        assert!(!settings.create_date_folders);
        assert!(!settings.skip_duplicates);
        assert!(settings.skip_no_extension);
        assert_eq!(settings.log_level, "info");
    }

    #[test]
    fn test_skip_duplicates_selects_policy() {
        let mut settings = Settings::default();
        assert_eq!(settings.duplicate_policy(), DuplicatePolicy::RenameUnique);
        settings.skip_duplicates = true;
        assert_eq!(settings.duplicate_policy(), DuplicatePolicy::Quarantine);
        assert_eq!(
            settings.organize_options().duplicate_policy,
            DuplicatePolicy::Quarantine
        );
    }

    #[test]
    fn test_empty_toml_gives_defaults() {
        let config = FileSortConfig::from_toml_str("").unwrap();
        assert_eq!(config, FileSortConfig::default());
    }

    #[test]
    fn test_partial_settings_keep_other_defaults() {
        let config = FileSortConfig::from_toml_str(
            r#"
[settings]
create_date_folders = true
"#,
        )
        .unwrap();
        assert!(config.settings.create_date_folders);
        assert!(config.settings.skip_no_extension);
        assert_eq!(config.categories, CategoryTable::default());
    }

    #[test]
    fn test_user_categories_merge_over_defaults() {
        let config = FileSortConfig::from_toml_str(
            r#"
[categories]
Documents = [".pdf"]
Ebooks = ["EPUB"]
"#,
        )
        .unwrap();
        let table = &config.categories;
        assert_eq!(table.classify(".pdf"), "Documents");
        assert_eq!(table.classify(".epub"), "Ebooks");
        // Documents no longer claims .txt, and it kept its first position
        assert_eq!(table.classify(".txt"), "Misc");
        assert_eq!(table.categories().next(), Some("Documents"));
        assert_eq!(table.categories().last(), Some("Ebooks"));
        // untouched defaults survive
        assert_eq!(table.classify(".jpg"), "Images");
    }

    #[test]
    fn test_empty_user_category_removes_default() {
        let config = FileSortConfig::from_toml_str(
            r#"
[categories]
Installers = []
"#,
        )
        .unwrap();
        let defaults = CategoryTable::default();
        assert_eq!(config.categories.len(), defaults.len() - 1);
        assert!(config.categories.categories().all(|name| name != "Installers"));
        assert_eq!(config.categories.classify(".exe"), "Misc");
    }

    #[test]
    fn test_replace_categories_drops_defaults() {
        let config = FileSortConfig::from_toml_str(
            r#"
[settings]
replace_categories = true

[categories]
Ebooks = [".epub"]
"#,
        )
        .unwrap();
        assert_eq!(config.categories.len(), 1);
        assert_eq!(config.categories.classify(".jpg"), "Misc");
    }

    #[test]
    fn test_invalid_toml_is_rejected() {
        assert!(FileSortConfig::from_toml_str("[settings\nrecursive = ").is_err());
        assert!(FileSortConfig::from_toml_str("[settings]\nrecursive = \"yes\"").is_err());
    }

    #[test]
    fn test_load_missing_explicit_file() {
        let result = FileSortConfig::load(Some(Path::new("/non/existent/filesort.toml")));
        assert!(matches!(result, Err(ConfigError::ConfigNotFound(_))));
    }

    #[test]
    fn test_load_from_file() {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "[settings]\nrecursive = true\n\n[filters]\nexclude_filenames = [\"Thumbs.db\"]\n",
        )
        .expect("Failed to write config");

        let config = FileSortConfig::load(Some(&path)).expect("Failed to load config");
        assert!(config.settings.recursive);
        assert_eq!(config.filters.exclude_filenames, vec!["Thumbs.db"]);

        let options = config.organize_options().expect("Filters should compile");
        assert!(options.recursive);
        assert!(options.filters.is_some());
    }

    #[test]
    fn test_no_filters_means_no_compiled_filters() {
        let options = FileSortConfig::default().organize_options().unwrap();
        assert!(options.filters.is_none());
    }

    #[test]
    fn test_hidden_files_included_unless_skipped() {
        let filters = FilterRules::default().compile().unwrap();
        assert!(filters.should_include(Path::new(".bashrc")));

        let filters = FilterRules {
            skip_hidden: true,
            ..Default::default()
        }
        .compile()
        .unwrap();
        assert!(!filters.should_include(Path::new(".bashrc")));
        assert!(filters.should_include(Path::new("notes.txt")));
    }

    #[test]
    fn test_exclude_exact_filename() {
        let mut filters = FilterRules {
            exclude_filenames: vec!["Thumbs.db".to_string()],
            ..Default::default()
        }
        .compile()
        .unwrap();
        filters.exclude_filename(".filesort_history.json");

        assert!(!filters.should_include(Path::new("Thumbs.db")));
        assert!(!filters.should_include(Path::new("sub/Thumbs.db")));
        assert!(!filters.should_include(Path::new(".filesort_history.json")));
        assert!(filters.should_include(Path::new("image.jpg")));
    }

    #[test]
    fn test_exclude_glob_respects_directory_boundaries() {
        let filters = FilterRules {
            exclude_patterns: vec!["**/logs/**".to_string(), "*.tmp".to_string()],
            ..Default::default()
        }
        .compile()
        .unwrap();

        assert!(!filters.should_include(Path::new("logs/app.log")));
        assert!(!filters.should_include(Path::new("app/logs/app.log")));
        assert!(!filters.should_include(Path::new("scratch.tmp")));
        assert!(filters.should_include(Path::new("my_logs/app.log")));
    }

    #[test]
    fn test_exclude_regex_on_file_name() {
        let filters = FilterRules {
            exclude_regex: vec![r"^~\$".to_string()],
            ..Default::default()
        }
        .compile()
        .unwrap();

        assert!(!filters.should_include(Path::new("~$report.docx")));
        assert!(filters.should_include(Path::new("report.docx")));
    }

    #[test]
    fn test_invalid_patterns_return_errors() {
        let bad_regex = FilterRules {
            exclude_regex: vec!["[invalid(".to_string()],
            ..Default::default()
        };
        assert!(matches!(
            bad_regex.compile(),
            Err(ConfigError::InvalidRegexPattern { .. })
        ));

        let bad_glob = FilterRules {
            exclude_patterns: vec!["[invalid".to_string()],
            ..Default::default()
        };
        assert!(matches!(
            bad_glob.compile(),
            Err(ConfigError::InvalidGlobPattern { .. })
        ));
    }
}
