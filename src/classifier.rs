//! File classification by extension.
//!
//! This module maps file names to category labels (e.g., "Images",
//! "Documents") through an immutable extension table. The table is built once,
//! optionally from user configuration, and handed to a [`Classifier`]; nothing
//! is global, so tests and callers can use their own mappings side by side.
//!
//! # Examples
//!
//! ```
//! use dirsort::classifier::Classifier;
//!
//! let classifier = Classifier::default();
//! assert_eq!(classifier.classify("holiday.JPG"), "Images");
//! assert_eq!(classifier.classify("backup.tar.gz"), "Archives");
//! assert_eq!(classifier.classify("Makefile"), "No Extension");
//! assert_eq!(classifier.classify("data.xyz"), "Other");
//! ```

use crate::path_planner::split_last_extension;
use std::collections::{BTreeSet, HashMap};

/// Label for files whose extension is not in the table.
pub const OTHER_LABEL: &str = "Other";

/// Label for files without any extension.
pub const NO_EXTENSION_LABEL: &str = "No Extension";

/// Mutable builder for the extension → category mapping.
///
/// Extensions are stored lowercase and without a leading dot. Compound
/// extensions such as `tar.gz` are stored as-is and take precedence over
/// their last segment.
#[derive(Debug, Clone, Default)]
pub struct CategoryTable {
    extension_map: HashMap<String, String>,
}

impl CategoryTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a table holding the built-in mappings.
    pub fn standard() -> Self {
        let mut table = Self::new();
        table.populate_standard_mappings();
        table
    }

    fn populate_standard_mappings(&mut self) {
        // Images
        for ext in [
            "jpg", "jpeg", "png", "gif", "bmp", "webp", "svg", "tiff", "ico", "heic",
        ] {
            self.add_extension_mapping(ext, "Images");
        }

        // Documents
        for ext in [
            "pdf", "doc", "docx", "txt", "rtf", "odt", "md", "xlsx", "xls", "csv", "pptx", "ppt",
        ] {
            self.add_extension_mapping(ext, "Documents");
        }

        // Videos
        for ext in ["mp4", "avi", "mov", "mkv", "wmv", "flv", "webm", "3gp"] {
            self.add_extension_mapping(ext, "Videos");
        }

        // Audio
        for ext in ["mp3", "wav", "flac", "aac", "ogg", "m4a", "wma"] {
            self.add_extension_mapping(ext, "Audio");
        }

        // Archives, including the compound tarball forms
        for ext in [
            "zip", "rar", "7z", "tar", "gz", "bz2", "xz", "tgz", "tar.gz", "tar.bz2", "tar.xz",
        ] {
            self.add_extension_mapping(ext, "Archives");
        }

        // Code
        for ext in [
            "py", "rs", "js", "ts", "java", "c", "cpp", "h", "hpp", "go", "sh", "json", "xml",
            "yaml", "yml", "toml", "html", "css",
        ] {
            self.add_extension_mapping(ext, "Code");
        }

        // Fonts
        for ext in ["ttf", "otf", "woff", "woff2"] {
            self.add_extension_mapping(ext, "Fonts");
        }
    }

    /// Adds or replaces a mapping. A leading dot on `ext` is ignored.
    pub fn add_extension_mapping(&mut self, ext: &str, category: &str) {
        let ext = ext.trim_start_matches('.').to_lowercase();
        if ext.is_empty() {
            return;
        }
        self.extension_map.insert(ext, category.to_string());
    }

    pub fn len(&self) -> usize {
        self.extension_map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.extension_map.is_empty()
    }
}

/// Maps file names to category labels.
///
/// Once built, a classifier never changes; it is cheap to share by reference
/// across a whole scan.
#[derive(Debug, Clone)]
pub struct Classifier {
    extension_map: HashMap<String, String>,
}

impl Classifier {
    /// Freezes `table` into a classifier.
    pub fn new(table: CategoryTable) -> Self {
        Self {
            extension_map: table.extension_map,
        }
    }

    /// Returns the category label for a file name.
    ///
    /// Matching is case-insensitive. The longest known compound suffix wins
    /// before falling back to the last extension segment.
    ///
    /// # Examples
    ///
    /// ```
    /// use dirsort::classifier::{CategoryTable, Classifier};
    ///
    /// let mut table = CategoryTable::new();
    /// table.add_extension_mapping("gz", "Compressed");
    /// table.add_extension_mapping("tar.gz", "Tarballs");
    /// let classifier = Classifier::new(table);
    ///
    /// assert_eq!(classifier.classify("src.tar.gz"), "Tarballs");
    /// assert_eq!(classifier.classify("log.gz"), "Compressed");
    /// ```
    pub fn classify(&self, file_name: &str) -> &str {
        match self.split_extension(file_name).1 {
            None => NO_EXTENSION_LABEL,
            Some(ext) => self
                .extension_map
                .get(&ext.to_lowercase())
                .map(String::as_str)
                .unwrap_or(OTHER_LABEL),
        }
    }

    /// Splits a file name into stem and extension.
    ///
    /// The extension is the longest suffix present in the table, or the last
    /// dot-separated segment when no suffix is known. A leading dot (as in
    /// `.bashrc`) does not start an extension, and neither does a trailing
    /// dot.
    ///
    /// ```
    /// use dirsort::classifier::Classifier;
    ///
    /// let classifier = Classifier::default();
    /// assert_eq!(classifier.split_extension("site.tar.gz"), ("site", Some("tar.gz")));
    /// assert_eq!(classifier.split_extension("notes.v2.txt"), ("notes.v2", Some("txt")));
    /// assert_eq!(classifier.split_extension(".bashrc"), (".bashrc", None));
    /// ```
    pub fn split_extension<'a>(&self, file_name: &'a str) -> (&'a str, Option<&'a str>) {
        let dots: Vec<usize> = file_name
            .char_indices()
            .filter(|&(idx, ch)| ch == '.' && idx > 0)
            .map(|(idx, _)| idx)
            .collect();

        // Leftmost dot first, so the longest suffix is tried first
        for &dot in &dots {
            let suffix = &file_name[dot + 1..];
            if !suffix.is_empty() && self.extension_map.contains_key(&suffix.to_lowercase()) {
                return (&file_name[..dot], Some(suffix));
            }
        }

        split_last_extension(file_name)
    }

    /// Every label this classifier can return, in name order.
    pub fn labels(&self) -> BTreeSet<&str> {
        let mut labels: BTreeSet<&str> = self.extension_map.values().map(String::as_str).collect();
        labels.insert(OTHER_LABEL);
        labels.insert(NO_EXTENSION_LABEL);
        labels
    }

    /// Returns true if `name` is a label this classifier can produce.
    pub fn is_label(&self, name: &str) -> bool {
        name == OTHER_LABEL
            || name == NO_EXTENSION_LABEL
            || self.extension_map.values().any(|label| label == name)
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(CategoryTable::standard())
    }
}
